use std::{
    collections::{BTreeMap, HashSet},
    ops::Deref,
    path::PathBuf,
    sync::{Arc, Mutex, RwLock},
};

use chrono::{DateTime, Utc};
use coingro_common::response::print_warning;
use coingro_types::{BotConfig, State, api};
use owo_colors::OwoColorize;

use crate::{
    config::Config,
    constants::{CONTROLLER_VERSION, STRATEGIES_DIR, STRATEGY_REFRESH_PERIOD_HOURS},
    error::Error,
    k8s::{ClusterClient, pod_phase},
    names,
    persistence::{Database, NewBot, NewStrategy, StrategyRecord, StrategyStats},
    rpc::CoingroClient,
    strategies,
};

pub struct ControllerInner {
    config: Config,
    default_bot_config: BotConfig,
    db: Database,
    k8s: ClusterClient,
    client: CoingroClient,
    state: Mutex<State>,
    last_process: RwLock<Option<DateTime<Utc>>>,
}

/// The reconciler: drives observed cluster state toward the desired state
/// declared in the database, one throttled pass at a time. Cheap to clone;
/// shared between the supervisor loop and the HTTP handlers.
#[derive(Clone)]
pub struct Controller {
    inner: Arc<ControllerInner>,
}

/// Handle shared by the supervisor (which swaps in a fresh reconciler on
/// RELOAD_CONFIG) and the HTTP server (which reads through it per request).
pub type SharedController = Arc<tokio::sync::RwLock<Controller>>;

impl Deref for Controller {
    type Target = ControllerInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl Controller {
    pub async fn new(config: Config) -> Result<Self, Error> {
        println!(
            "{}{}",
            "🚀 Starting coingro controller • ".green(),
            CONTROLLER_VERSION.green().dimmed()
        );
        let db = Database::connect(config.db_url()).await?;
        let k8s = ClusterClient::new(&config).await?;
        let client = CoingroClient::new(&config);
        let state = config.initial_state.unwrap_or(State::Stopped);
        let default_bot_config = config.default_bot_config();
        Ok(Self {
            inner: Arc::new(ControllerInner {
                config,
                default_bot_config,
                db,
                k8s,
                client,
                state: Mutex::new(state),
                last_process: RwLock::new(None),
            }),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn client(&self) -> &CoingroClient {
        &self.client
    }

    pub fn state(&self) -> State {
        *self.state.lock().expect("state mutex poisoned")
    }

    pub fn set_state(&self, state: State) {
        *self.state.lock().expect("state mutex poisoned") = state;
    }

    /// Timestamp of the last completed reconcile pass; the epoch before the
    /// first one finishes.
    pub fn last_process(&self) -> DateTime<Utc> {
        self.last_process
            .read()
            .expect("last_process lock poisoned")
            .unwrap_or(DateTime::UNIX_EPOCH)
    }

    /// Called when the supervisor enters RUNNING.
    pub async fn startup(&self) {}

    /// One reconcile tick over bots and strategies.
    pub async fn process(&self) -> Result<(), Error> {
        self.check_bots().await?;
        self.refresh_strategies().await?;
        self.check_strategies().await?;
        *self
            .last_process
            .write()
            .expect("last_process lock poisoned") = Some(Utc::now());
        Ok(())
    }

    pub async fn process_stopped(&self) {}

    /// Cleanup pending resources on an already stopped controller.
    pub async fn cleanup(&self) {
        println!("{}", "🧹 Cleaning up modules ...".yellow());
        self.db.close().await;
    }

    /// Drives every active, non-tombstoned bot toward a Running pod of the
    /// controller's own image version.
    pub async fn check_bots(&self) -> Result<(), Error> {
        for bot in self.db.get_active_bots().await? {
            let bot_id = bot.bot_id.to_lowercase();
            let pod = self.k8s.get_pod(&bot_id).await;
            let phase = pod.as_ref().and_then(pod_phase);
            let outdated = match is_outdated(&bot.version, &self.config.cg_version) {
                Ok(outdated) => outdated,
                Err(e) => {
                    print_warning(anyhow::anyhow!(
                        "Bot {} has an unparseable version '{}' ({}); replacing.",
                        bot.bot_id,
                        bot.version,
                        e
                    ));
                    true
                }
            };
            if !bot_needs_provision(phase, outdated) {
                continue;
            }
            let env = if bot.is_strategy && self.db.strategy_by_bot_id(&bot.bot_id).await?.is_some()
            {
                strategy_env(&bot.bot_name)
            } else {
                BTreeMap::new()
            };
            if let Err(e) = self
                .create_bot(Some(&bot.bot_id), None, None, bot.is_strategy, outdated, env)
                .await
            {
                print_warning(anyhow::anyhow!(
                    "Could not reconcile bot {}: {}",
                    bot.bot_id,
                    e
                ));
            }
        }
        Ok(())
    }

    /// The authoritative upsert: provisions (or re-provisions) the pod and
    /// service for a bot and writes the row back. Returns the final
    /// `(bot_id, bot_name)` pair. Tombstoned bots are never re-created.
    pub async fn create_bot(
        &self,
        bot_id: Option<&str>,
        bot_name: Option<&str>,
        user_id: Option<i64>,
        is_strategy: bool,
        update: bool,
        mut env_vars: BTreeMap<String, String>,
    ) -> Result<(String, String), Error> {
        let bot_id = match bot_id {
            Some(id) => id.to_lowercase(),
            None => self.draw_bot_id().await?,
        };

        let bot = self.db.bot_by_id(&bot_id).await?;

        let bot_name = match bot_name {
            Some(name) => name.to_string(),
            None => match &bot {
                Some(bot) => bot.bot_name.clone(),
                None => names::random_bot_name(&mut rand::rng()),
            },
        };

        env_vars.insert("COINGRO__BOT_NAME".to_string(), bot_name.clone());
        if let Some(bot) = &bot
            && let Some(state) = bot.state
        {
            env_vars.insert("COINGRO__INITIAL_STATE".to_string(), state.as_str().to_string());
        }

        if bot.as_ref().is_some_and(|b| b.is_deleted()) {
            // Tombstones are permanent.
            return Ok((bot_id, bot_name));
        }

        let mut bot_config = bot
            .as_ref()
            .and_then(|b| b.configuration.clone())
            .unwrap_or_else(|| self.default_bot_config.clone());
        bot_config.set_bot_name(&bot_name);

        if self.k8s.get_pod(&bot_id).await.is_some() {
            self.k8s
                .replace_bot_instance(&bot_id, &bot_config, &env_vars)
                .await;
            println!(
                "{}{}",
                "🔁 Restarted coingro instance • ".green(),
                bot_id.green().dimmed()
            );
        } else {
            self.k8s
                .create_bot_instance(&bot_id, &bot_config, &env_vars)
                .await;
            println!(
                "{}{}",
                "✨ Created coingro instance • ".green(),
                bot_id.green().dimmed()
            );
        }

        let api_url = self.config.api_url_for(&bot_id);
        match &bot {
            None => {
                let state = if is_strategy {
                    Some(State::Running)
                } else {
                    self.config.cg_initial_state
                };
                self.db
                    .insert_bot(&NewBot {
                        bot_id: bot_id.clone(),
                        user_id,
                        bot_name: bot_name.clone(),
                        image: self.config.cg_image.clone(),
                        version: self.config.cg_version.clone(),
                        api_url,
                        strategy: is_strategy.then(|| bot_name.clone()),
                        exchange: is_strategy
                            .then(|| self.config.default_strategy_exchange.clone()),
                        stake_currency: is_strategy
                            .then(|| self.config.default_strategy_stake_currency.clone()),
                        state,
                        is_strategy,
                        configuration: Some(bot_config),
                    })
                    .await?;
            }
            Some(_) => {
                self.db
                    .update_bot_provision(
                        &bot_id,
                        &Some(bot_config),
                        &self.config.cg_image,
                        &self.config.cg_version,
                        &api_url,
                        update,
                    )
                    .await?;
            }
        }

        Ok((bot_id, bot_name))
    }

    async fn draw_bot_id(&self) -> Result<String, Error> {
        loop {
            let id = names::random_bot_id(&mut rand::rng());
            if self.db.bot_by_id(&id).await?.is_none() {
                return Ok(id);
            }
        }
    }

    /// Tears the pod and service down and marks the row inactive; with
    /// `delete`, stamps the permanent tombstone and drops the per-bot user
    /// data claim if one exists.
    pub async fn deactivate_bot(
        &self,
        bot_id: &str,
        delete: bool,
    ) -> Result<Option<String>, Error> {
        let Some(bot) = self.db.bot_by_id(bot_id).await? else {
            return Ok(None);
        };
        self.k8s.delete_bot_instance(&bot.bot_id).await;
        if delete
            && let Err(e) = self
                .k8s
                .delete_pvc(&format!("{}-user-data-pvc", bot.bot_id))
                .await
        {
            print_warning(anyhow::anyhow!(
                "Could not delete user data claim for {}: {}",
                bot.bot_id,
                e
            ));
        }
        self.db.deactivate_bot_row(&bot.bot_id, delete).await?;
        Ok(Some(bot.bot_id))
    }

    fn strategy_directory(&self) -> PathBuf {
        self.config
            .strategy_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(STRATEGIES_DIR))
    }

    /// Materializes a strategy bot per discovered plugin and retires the
    /// ones whose plugin disappeared.
    pub async fn check_strategies(&self) -> Result<(), Error> {
        let manifests = strategies::search_strategies(
            &self.strategy_directory(),
            self.config.recursive_strategy_search,
        )?;

        let known: HashSet<String> = self.db.strategy_names().await?.into_iter().collect();
        for manifest in &manifests {
            if known.contains(&manifest.name) {
                continue;
            }
            let env = strategy_env(&manifest.name);
            let (bot_id, _) = self
                .create_bot(Some(&manifest.name), Some(&manifest.name), None, true, false, env)
                .await?;
            let Some(bot) = self.db.bot_by_id(&bot_id).await? else {
                continue;
            };
            if bot.is_deleted() {
                continue;
            }
            self.db
                .insert_strategy(&NewStrategy {
                    strategy_name: manifest.name.clone(),
                    bot_pk: bot.id,
                    category: manifest.category.clone(),
                    tags: manifest.joined_tags(),
                    short_description: manifest.short_description.clone(),
                    long_description: manifest.long_description.clone(),
                })
                .await?;
            println!(
                "{}{}",
                "🧩 Registered strategy • ".green(),
                manifest.name.green().dimmed()
            );
        }

        let discovered: HashSet<&str> = manifests.iter().map(|m| m.name.as_str()).collect();
        for strategy in self.db.get_active_strategies().await? {
            if !discovered.contains(strategy.bot_name.as_str()) {
                self.deactivate_bot(&strategy.bot_bot_id, false).await?;
            }
        }
        Ok(())
    }

    /// Pulls profit and trade-summary statistics from each active strategy
    /// bot whose numbers have gone stale. Failures are isolated per
    /// strategy.
    pub async fn refresh_strategies(&self) -> Result<(), Error> {
        let now = Utc::now();
        let period = chrono::Duration::hours(STRATEGY_REFRESH_PERIOD_HOURS);
        for strategy in self.db.get_active_strategies().await? {
            if !strategy.needs_refresh(now, period) {
                continue;
            }
            if let Err(e) = self.refresh_strategy(&strategy).await {
                print_warning(anyhow::anyhow!(
                    "Could not update trade statistics for strategy {} due to {}.",
                    strategy.bot_name,
                    e
                ));
            }
        }
        Ok(())
    }

    async fn refresh_strategy(&self, strategy: &StrategyRecord) -> Result<(), Error> {
        let api_url = &strategy.bot_api_url;
        self.db
            .update_bot_strategy(&strategy.bot_bot_id, &strategy.bot_name)
            .await?;

        let profit: api::Profit =
            serde_json::from_value(self.client.profit(api_url).await?)?;
        let summary: api::TradeSummary =
            serde_json::from_value(self.client.trade_summary(api_url).await?)?;

        let stats = stats_from_responses(&profit, &summary);
        self.db
            .update_strategy_stats(strategy.id, &stats, Utc::now())
            .await?;
        println!(
            "{}{}",
            "📈 Updated trade statistics for strategy • ".green(),
            strategy.bot_name.green().dimmed()
        );
        Ok(())
    }
}

/// Env forced onto every strategy-plugin-backed bot.
pub(crate) fn strategy_env(bot_name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("COINGRO__STRATEGY".to_string(), bot_name.to_string()),
        ("COINGRO__INITIAL_STATE".to_string(), "running".to_string()),
        ("COINGRO__MAX_OPEN_TRADES".to_string(), "-1".to_string()),
        ("COINGRO__DRY_RUN_WALLET".to_string(), "100000".to_string()),
    ])
}

/// A bot needs (re)provisioning unless its pod is Running or Pending at the
/// controller's current image version.
pub(crate) fn bot_needs_provision(phase: Option<&str>, outdated: bool) -> bool {
    !matches!(phase, Some("Running") | Some("Pending")) || outdated
}

/// Strict semantic-version comparison.
pub(crate) fn is_outdated(bot_version: &str, controller_version: &str) -> Result<bool, Error> {
    let bot = semver::Version::parse(bot_version.trim())?;
    let controller = semver::Version::parse(controller_version.trim())?;
    Ok(bot < controller)
}

/// Field mapping from the bot's responses onto the strategy row.
pub(crate) fn stats_from_responses(
    profit: &api::Profit,
    summary: &api::TradeSummary,
) -> StrategyStats {
    fn first_entry(profit: &api::TimeUnitProfit) -> (f64, i64) {
        profit
            .data
            .first()
            .map(|entry| (entry.rel_profit, entry.trade_count))
            .unwrap_or((0.0, 0))
    }

    let (daily_profit, daily_trade_count) = first_entry(&summary.daily);
    let (weekly_profit, weekly_trade_count) = first_entry(&summary.weekly);
    let (monthly_profit, monthly_trade_count) = first_entry(&summary.monthly);
    StrategyStats {
        profit_ratio_mean: profit.profit_all_ratio_mean,
        profit_ratio_sum: profit.profit_all_ratio_sum,
        profit_ratio: profit.profit_all_ratio,
        first_trade: DateTime::from_timestamp_millis(profit.first_trade_timestamp),
        latest_trade: DateTime::from_timestamp_millis(profit.latest_trade_timestamp),
        avg_duration: profit.avg_duration.clone(),
        winning_trades: profit.winning_trades,
        losing_trades: profit.losing_trades,
        daily_profit,
        daily_trade_count,
        weekly_profit,
        weekly_trade_count,
        monthly_profit,
        monthly_trade_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provisioning_is_needed_unless_running_or_pending() {
        assert!(!bot_needs_provision(Some("Running"), false));
        assert!(!bot_needs_provision(Some("Pending"), false));
        assert!(bot_needs_provision(Some("Failed"), false));
        assert!(bot_needs_provision(Some("Succeeded"), false));
        assert!(bot_needs_provision(None, false));
        // An outdated image forces a replace even while Running.
        assert!(bot_needs_provision(Some("Running"), true));
    }

    #[test]
    fn version_ordering_is_semver() {
        assert!(is_outdated("0.0.1", "1.0.0").unwrap());
        assert!(is_outdated("1.0.0-rc.1", "1.0.0").unwrap());
        assert!(!is_outdated("1.0.0", "1.0.0").unwrap());
        assert!(!is_outdated("1.2.0", "1.0.0").unwrap());
        assert!(is_outdated("not-a-version", "1.0.0").is_err());
    }

    #[test]
    fn strategy_env_forces_unlimited_dry_run() {
        let env = strategy_env("Strategy01");
        assert_eq!(env["COINGRO__STRATEGY"], "Strategy01");
        assert_eq!(env["COINGRO__INITIAL_STATE"], "running");
        assert_eq!(env["COINGRO__MAX_OPEN_TRADES"], "-1");
        assert_eq!(env["COINGRO__DRY_RUN_WALLET"], "100000");
    }

    #[test]
    fn stats_copy_the_first_window_of_each_timeframe() {
        let profit: api::Profit = serde_json::from_value(serde_json::json!({
            "profit_all_ratio_mean": 0.02,
            "profit_all_ratio_sum": 0.4,
            "profit_all_ratio": 0.39,
            "first_trade_timestamp": 1_651_000_000_000_i64,
            "latest_trade_timestamp": 1_652_000_000_000_i64,
            "avg_duration": "0:45:00",
            "winning_trades": 12,
            "losing_trades": 8,
        }))
        .unwrap();
        let summary: api::TradeSummary = serde_json::from_value(serde_json::json!({
            "daily": {"data": [{"rel_profit": 0.01, "trade_count": 3}, {"rel_profit": 0.5, "trade_count": 9}]},
            "weekly": {"data": [{"rel_profit": 0.05, "trade_count": 14}]},
            "monthly": {"data": []},
        }))
        .unwrap();

        let stats = stats_from_responses(&profit, &summary);
        assert_eq!(stats.profit_ratio_mean, 0.02);
        assert_eq!(stats.daily_profit, 0.01);
        assert_eq!(stats.daily_trade_count, 3);
        assert_eq!(stats.weekly_trade_count, 14);
        assert_eq!(stats.monthly_trade_count, 0);
        assert_eq!(stats.winning_trades + stats.losing_trades, 20);
        assert_eq!(
            stats.first_trade.unwrap().timestamp_millis(),
            1_651_000_000_000
        );
    }
}
