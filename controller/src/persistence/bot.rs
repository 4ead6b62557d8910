use chrono::{DateTime, Utc};
use coingro_types::{BotConfig, State};
use sqlx::{Row, any::AnyRow};

use super::{Database, fmt_ts, parse_ts, sql};
use crate::error::Error;

/// One managed coingro instance as persisted in the `bots` table.
#[derive(Clone, Debug)]
pub struct BotRecord {
    pub id: i64,
    pub bot_id: String,
    pub user_id: Option<i64>,
    pub bot_name: String,
    pub image: String,
    pub version: String,
    pub api_url: String,
    pub strategy: Option<String>,
    pub exchange: Option<String>,
    pub stake_currency: Option<String>,
    pub state: Option<State>,
    pub is_active: bool,
    pub is_strategy: bool,
    pub configuration: Option<BotConfig>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl BotRecord {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Insert payload for a bot row that has just been provisioned.
#[derive(Clone, Debug)]
pub struct NewBot {
    pub bot_id: String,
    pub user_id: Option<i64>,
    pub bot_name: String,
    pub image: String,
    pub version: String,
    pub api_url: String,
    pub strategy: Option<String>,
    pub exchange: Option<String>,
    pub stake_currency: Option<String>,
    pub state: Option<State>,
    pub is_strategy: bool,
    pub configuration: Option<BotConfig>,
}

pub(crate) fn bot_from_row(row: &AnyRow) -> Result<BotRecord, Error> {
    let state: Option<String> = row.try_get("state")?;
    let configuration: Option<String> = row.try_get("configuration")?;
    let created_at: String = row.try_get("created_at")?;
    Ok(BotRecord {
        id: row.try_get("id")?,
        bot_id: row.try_get("bot_id")?,
        user_id: row.try_get("user_id")?,
        bot_name: row.try_get("bot_name")?,
        image: row.try_get("image")?,
        version: row.try_get("version")?,
        api_url: row.try_get("api_url")?,
        strategy: row.try_get("strategy")?,
        exchange: row.try_get("exchange")?,
        stake_currency: row.try_get("stake_currency")?,
        state: state
            .map(|s| {
                s.parse::<State>()
                    .map_err(|e| Error::operational(format!("Invalid bot state: {}", e)))
            })
            .transpose()?,
        is_active: row.try_get::<i32, _>("is_active")? != 0,
        is_strategy: row.try_get::<i32, _>("is_strategy")? != 0,
        configuration: configuration
            .map(|raw| serde_json::from_str::<BotConfig>(&raw))
            .transpose()?,
        created_at: parse_ts(Some(created_at))?
            .ok_or_else(|| Error::operational("Missing created_at"))?,
        updated_at: parse_ts(row.try_get("updated_at")?)?,
        deleted_at: parse_ts(row.try_get("deleted_at")?)?,
    })
}

fn configuration_json(configuration: &Option<BotConfig>) -> Result<Option<String>, Error> {
    configuration
        .as_ref()
        .map(|c| serde_json::to_string(c).map_err(Error::from))
        .transpose()
}

impl Database {
    pub async fn bot_by_id(&self, bot_id: &str) -> Result<Option<BotRecord>, Error> {
        let row = sqlx::query(sql::BOT_BY_ID)
            .bind(bot_id)
            .fetch_optional(self.pool())
            .await?;
        row.as_ref().map(bot_from_row).transpose()
    }

    pub async fn get_active_bots(&self) -> Result<Vec<BotRecord>, Error> {
        let rows = sqlx::query(sql::GET_ACTIVE_BOTS)
            .fetch_all(self.pool())
            .await?;
        rows.iter().map(bot_from_row).collect()
    }

    pub async fn get_strategy_bots(&self) -> Result<Vec<BotRecord>, Error> {
        let rows = sqlx::query(sql::GET_STRATEGY_BOTS)
            .fetch_all(self.pool())
            .await?;
        rows.iter().map(bot_from_row).collect()
    }

    pub async fn insert_bot(&self, bot: &NewBot) -> Result<i64, Error> {
        let row = sqlx::query(sql::INSERT_BOT)
            .bind(&bot.bot_id)
            .bind(bot.user_id)
            .bind(&bot.bot_name)
            .bind(&bot.image)
            .bind(&bot.version)
            .bind(&bot.api_url)
            .bind(&bot.strategy)
            .bind(&bot.exchange)
            .bind(&bot.stake_currency)
            .bind(bot.state.map(|s| s.as_str().to_string()))
            .bind(1_i32)
            .bind(if bot.is_strategy { 1_i32 } else { 0_i32 })
            .bind(configuration_json(&bot.configuration)?)
            .bind(fmt_ts(Utc::now()))
            .fetch_one(self.pool())
            .await?;
        Ok(row.try_get::<i64, _>(0)?)
    }

    /// Write-back after a (re)provision: configuration, activation, image,
    /// version and derived api url; `bump_updated` stamps `updated_at`.
    pub async fn update_bot_provision(
        &self,
        bot_id: &str,
        configuration: &Option<BotConfig>,
        image: &str,
        version: &str,
        api_url: &str,
        bump_updated: bool,
    ) -> Result<(), Error> {
        sqlx::query(sql::UPDATE_BOT_PROVISION)
            .bind(bot_id)
            .bind(configuration_json(configuration)?)
            .bind(image)
            .bind(version)
            .bind(api_url)
            .bind(bump_updated.then(|| fmt_ts(Utc::now())))
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// Marks a bot inactive; with `delete`, stamps the permanent tombstone.
    pub async fn deactivate_bot_row(&self, bot_id: &str, delete: bool) -> Result<(), Error> {
        sqlx::query(sql::DEACTIVATE_BOT)
            .bind(bot_id)
            .bind(delete.then(|| fmt_ts(Utc::now())))
            .execute(self.pool())
            .await?;
        Ok(())
    }

    pub async fn update_bot_state(&self, bot_id: &str, state: State) -> Result<(), Error> {
        sqlx::query(sql::UPDATE_BOT_STATE)
            .bind(bot_id)
            .bind(state.as_str())
            .execute(self.pool())
            .await?;
        Ok(())
    }

    pub async fn update_bot_exchange(&self, bot_id: &str, exchange: &str) -> Result<(), Error> {
        sqlx::query(sql::UPDATE_BOT_EXCHANGE)
            .bind(bot_id)
            .bind(exchange)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    pub async fn update_bot_strategy(&self, bot_id: &str, strategy: &str) -> Result<(), Error> {
        sqlx::query(sql::UPDATE_BOT_STRATEGY)
            .bind(bot_id)
            .bind(strategy)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    pub async fn update_bot_settings(
        &self,
        bot_id: &str,
        bot_name: Option<&str>,
        stake_currency: Option<&str>,
    ) -> Result<(), Error> {
        sqlx::query(sql::UPDATE_BOT_SETTINGS)
            .bind(bot_id)
            .bind(bot_name)
            .bind(stake_currency)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    pub async fn update_bot_configuration(
        &self,
        bot_id: &str,
        configuration: &BotConfig,
    ) -> Result<(), Error> {
        sqlx::query(sql::UPDATE_BOT_CONFIGURATION)
            .bind(bot_id)
            .bind(serde_json::to_string(configuration)?)
            .execute(self.pool())
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_bot(bot_id: &str) -> NewBot {
        NewBot {
            bot_id: bot_id.to_string(),
            user_id: None,
            bot_name: "Swift Falcon".to_string(),
            image: "coingro/coingro".to_string(),
            version: "1.0.0".to_string(),
            api_url: format!("http://{}", bot_id),
            strategy: None,
            exchange: None,
            stake_currency: None,
            state: Some(State::Running),
            is_strategy: false,
            configuration: None,
        }
    }

    #[tokio::test]
    async fn insert_and_fetch_round_trip() {
        let db = Database::connect("sqlite://").await.unwrap();
        let id = db.insert_bot(&new_bot("coingro01")).await.unwrap();
        assert!(id > 0);

        let bot = db.bot_by_id("coingro01").await.unwrap().unwrap();
        assert_eq!(bot.id, id);
        assert_eq!(bot.bot_name, "Swift Falcon");
        assert_eq!(bot.state, Some(State::Running));
        assert!(bot.is_active);
        assert!(!bot.is_strategy);
        assert!(bot.deleted_at.is_none());
    }

    #[tokio::test]
    async fn tombstoned_bots_leave_the_active_set() {
        let db = Database::connect("sqlite://").await.unwrap();
        db.insert_bot(&new_bot("coingro01")).await.unwrap();
        db.insert_bot(&NewBot {
            is_strategy: true,
            ..new_bot("coingro02")
        })
        .await
        .unwrap();
        assert_eq!(db.get_active_bots().await.unwrap().len(), 2);
        assert_eq!(db.get_strategy_bots().await.unwrap().len(), 1);

        db.deactivate_bot_row("coingro01", true).await.unwrap();
        let active = db.get_active_bots().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].bot_id, "coingro02");

        let deleted = db.bot_by_id("coingro01").await.unwrap().unwrap();
        assert!(!deleted.is_active);
        assert!(deleted.is_deleted());
    }

    #[tokio::test]
    async fn provision_write_back_bumps_updated_at_only_on_update() {
        let db = Database::connect("sqlite://").await.unwrap();
        db.insert_bot(&NewBot {
            version: "0.0.1".to_string(),
            ..new_bot("coingro01")
        })
        .await
        .unwrap();

        db.update_bot_provision("coingro01", &None, "coingro/coingro", "1.0.0", "http://coingro01", false)
            .await
            .unwrap();
        let bot = db.bot_by_id("coingro01").await.unwrap().unwrap();
        assert_eq!(bot.version, "1.0.0");
        assert!(bot.updated_at.is_none());

        db.update_bot_provision("coingro01", &None, "coingro/coingro", "1.0.0", "http://coingro01", true)
            .await
            .unwrap();
        let bot = db.bot_by_id("coingro01").await.unwrap().unwrap();
        assert!(bot.updated_at.is_some());
    }

    #[tokio::test]
    async fn configuration_blob_round_trips() {
        let db = Database::connect("sqlite://").await.unwrap();
        let mut bot = new_bot("coingro01");
        bot.configuration = Some(
            serde_json::from_str(r#"{"bot_name": "Swift Falcon", "max_open_trades": -1}"#).unwrap(),
        );
        db.insert_bot(&bot).await.unwrap();

        let stored = db.bot_by_id("coingro01").await.unwrap().unwrap();
        let config = stored.configuration.unwrap();
        assert_eq!(
            config.max_open_trades,
            Some(coingro_types::MaxOpenTrades::Unlimited)
        );
    }
}
