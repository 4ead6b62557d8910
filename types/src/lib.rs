use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub mod api;

/// Lifecycle state of a bot (and of the controller itself).
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum State {
    Running,
    #[default]
    Stopped,
    ReloadConfig,
}

impl FromStr for State {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "running" => Ok(State::Running),
            "stopped" => Ok(State::Stopped),
            "reload_config" => Ok(State::ReloadConfig),
            _ => Err(format!("unknown state: {}", s)),
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            State::Running => write!(f, "RUNNING"),
            State::Stopped => write!(f, "STOPPED"),
            State::ReloadConfig => write!(f, "RELOAD_CONFIG"),
        }
    }
}

impl State {
    /// Wire form used in the database and in bot env vars.
    pub fn as_str(&self) -> &'static str {
        match self {
            State::Running => "running",
            State::Stopped => "stopped",
            State::ReloadConfig => "reload_config",
        }
    }
}

/// Access level of a controller user.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
    Superadmin,
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            "superadmin" => Ok(Role::Superadmin),
            _ => Err(format!("unknown role: {}", s)),
        }
    }
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
            Role::Superadmin => "superadmin",
        }
    }
}

/// Cap on concurrently open trades. The bot API has no notion of infinity in
/// JSON, so an unlimited cap travels as `-1` on the wire.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MaxOpenTrades {
    Unlimited,
    Limited(i64),
}

impl Serialize for MaxOpenTrades {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            MaxOpenTrades::Unlimited => serializer.serialize_i64(-1),
            MaxOpenTrades::Limited(n) => serializer.serialize_i64(*n),
        }
    }
}

impl<'de> Deserialize<'de> for MaxOpenTrades {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = f64::deserialize(deserializer)?;
        if raw < 0.0 || raw.is_infinite() {
            Ok(MaxOpenTrades::Unlimited)
        } else {
            Ok(MaxOpenTrades::Limited(raw as i64))
        }
    }
}

/// The configuration blob handed to a single bot. Only the fields the
/// controller itself touches are typed; everything else rides along in
/// `extra` untouched so user-supplied settings survive the round trip.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct BotConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_open_trades: Option<MaxOpenTrades>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stake_currency: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dry_run: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_data_dir: Option<String>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl BotConfig {
    pub fn set_bot_name(&mut self, name: &str) {
        self.bot_name = Some(name.to_string());
    }
}

/// Metadata carried by a discovered strategy plugin.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Default)]
pub struct StrategyManifest {
    /// Class-style identifier; doubles as the bot id (lowercased).
    #[serde(alias = "strategy_name")]
    pub name: String,

    #[serde(default)]
    pub category: Option<String>,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub short_description: Option<String>,

    #[serde(default)]
    pub long_description: Option<String>,
}

impl StrategyManifest {
    /// Comma-joined tag list, the form persisted on the strategy row.
    pub fn joined_tags(&self) -> String {
        self.tags.join(",")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_open_trades_unlimited_serializes_to_minus_one() {
        let cfg = BotConfig {
            bot_name: Some("Test Bot".into()),
            max_open_trades: Some(MaxOpenTrades::Unlimited),
            strategy: None,
            stake_currency: None,
            dry_run: None,
            user_data_dir: None,
            extra: BTreeMap::new(),
        };
        let value = serde_json::to_value(&cfg).unwrap();
        assert_eq!(value["max_open_trades"], serde_json::json!(-1));
    }

    #[test]
    fn max_open_trades_round_trips() {
        let cfg: BotConfig =
            serde_json::from_str(r#"{"max_open_trades": 5, "custom": true}"#).unwrap();
        assert_eq!(cfg.max_open_trades, Some(MaxOpenTrades::Limited(5)));
        assert_eq!(cfg.extra["custom"], serde_json::json!(true));

        let cfg: BotConfig = serde_json::from_str(r#"{"max_open_trades": -1}"#).unwrap();
        assert_eq!(cfg.max_open_trades, Some(MaxOpenTrades::Unlimited));
    }

    #[test]
    fn state_round_trips_through_wire_form() {
        for state in [State::Running, State::Stopped, State::ReloadConfig] {
            assert_eq!(state.as_str().parse::<State>(), Ok(state));
        }
        assert!("bogus".parse::<State>().is_err());
    }

    #[test]
    fn manifest_tags_join() {
        let manifest = StrategyManifest {
            name: "Strategy01".into(),
            tags: vec!["trend".into(), "spot".into()],
            ..Default::default()
        };
        assert_eq!(manifest.joined_tags(), "trend,spot");
    }
}
