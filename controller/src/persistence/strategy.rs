use chrono::{DateTime, Utc};
use coingro_types::api;
use sqlx::{Row, any::AnyRow};

use super::{Database, fmt_ts, parse_ts, print_ts, sql};
use crate::error::Error;

/// A strategy row joined with the bot that hosts it.
#[derive(Clone, Debug)]
pub struct StrategyRecord {
    pub id: i64,
    pub strategy_name: String,
    pub category: Option<String>,
    pub tags: Option<String>,
    pub short_description: Option<String>,
    pub long_description: Option<String>,

    pub daily_profit: f64,
    pub daily_trade_count: i64,
    pub weekly_profit: f64,
    pub weekly_trade_count: i64,
    pub monthly_profit: f64,
    pub monthly_trade_count: i64,
    pub profit_ratio_mean: f64,
    pub profit_ratio_sum: f64,
    pub profit_ratio: f64,
    pub trade_count: i64,
    pub first_trade: Option<DateTime<Utc>>,
    pub latest_trade: Option<DateTime<Utc>>,
    pub avg_duration: Option<String>,
    pub winning_trades: Option<i64>,
    pub losing_trades: Option<i64>,
    pub latest_refresh: Option<DateTime<Utc>>,

    // Joined from the backing bot row.
    pub bot_pk: i64,
    pub bot_bot_id: String,
    pub bot_name: String,
    pub bot_api_url: String,
    pub bot_is_active: bool,
}

impl StrategyRecord {
    /// True when the statistics are missing or older than `period`.
    pub fn needs_refresh(&self, now: DateTime<Utc>, period: chrono::Duration) -> bool {
        match self.latest_refresh {
            None => true,
            Some(last) => now - last > period,
        }
    }

    pub fn split_tags(&self) -> Vec<String> {
        self.tags
            .as_deref()
            .map(|tags| {
                tags.split(',')
                    .filter(|t| !t.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn to_mini(&self) -> api::StrategyMini {
        api::StrategyMini {
            name: self.bot_name.clone(),
            bot_id: self.bot_pk,
            category: self.category.clone(),
            tags: self.split_tags(),
            short_description: self.short_description.clone(),
            daily_profit: self.daily_profit,
            daily_trade_count: self.daily_trade_count,
            weekly_profit: self.weekly_profit,
            weekly_trade_count: self.weekly_trade_count,
            monthly_profit: self.monthly_profit,
            monthly_trade_count: self.monthly_trade_count,
            latest_refresh: self.latest_refresh.map(print_ts),
        }
    }

    pub fn to_response(&self) -> api::StrategyResponse {
        api::StrategyResponse {
            mini: self.to_mini(),
            long_description: self.long_description.clone(),
            profit_ratio_mean: self.profit_ratio_mean,
            profit_ratio_sum: self.profit_ratio_sum,
            profit_ratio: self.profit_ratio,
            trade_count: Some(self.trade_count),
            first_trade: self.first_trade.map(print_ts),
            latest_trade: self.latest_trade.map(print_ts),
            avg_duration: self.avg_duration.clone(),
            winning_trades: self.winning_trades,
            losing_trades: self.losing_trades,
        }
    }
}

/// Insert payload when a newly discovered plugin is materialized.
#[derive(Clone, Debug)]
pub struct NewStrategy {
    pub strategy_name: String,
    pub bot_pk: i64,
    pub category: Option<String>,
    pub tags: String,
    pub short_description: Option<String>,
    pub long_description: Option<String>,
}

/// Rolling counters copied from a bot's profit and trade-summary responses.
#[derive(Clone, Debug, Default)]
pub struct StrategyStats {
    pub profit_ratio_mean: f64,
    pub profit_ratio_sum: f64,
    pub profit_ratio: f64,
    pub first_trade: Option<DateTime<Utc>>,
    pub latest_trade: Option<DateTime<Utc>>,
    pub avg_duration: Option<String>,
    pub winning_trades: i64,
    pub losing_trades: i64,
    pub daily_profit: f64,
    pub daily_trade_count: i64,
    pub weekly_profit: f64,
    pub weekly_trade_count: i64,
    pub monthly_profit: f64,
    pub monthly_trade_count: i64,
}

fn strategy_from_row(row: &AnyRow) -> Result<StrategyRecord, Error> {
    Ok(StrategyRecord {
        id: row.try_get("id")?,
        strategy_name: row.try_get("strategy_name")?,
        category: row.try_get("category")?,
        tags: row.try_get("tags")?,
        short_description: row.try_get("short_description")?,
        long_description: row.try_get("long_description")?,
        daily_profit: row.try_get("daily_profit")?,
        daily_trade_count: row.try_get("daily_trade_count")?,
        weekly_profit: row.try_get("weekly_profit")?,
        weekly_trade_count: row.try_get("weekly_trade_count")?,
        monthly_profit: row.try_get("monthly_profit")?,
        monthly_trade_count: row.try_get("monthly_trade_count")?,
        profit_ratio_mean: row.try_get("profit_ratio_mean")?,
        profit_ratio_sum: row.try_get("profit_ratio_sum")?,
        profit_ratio: row.try_get("profit_ratio")?,
        trade_count: row.try_get("trade_count")?,
        first_trade: parse_ts(row.try_get("first_trade")?)?,
        latest_trade: parse_ts(row.try_get("latest_trade")?)?,
        avg_duration: row.try_get("avg_duration")?,
        winning_trades: row.try_get("winning_trades")?,
        losing_trades: row.try_get("losing_trades")?,
        latest_refresh: parse_ts(row.try_get("latest_refresh")?)?,
        bot_pk: row.try_get("bot_pk")?,
        bot_bot_id: row.try_get("bot_bot_id")?,
        bot_name: row.try_get("bot_name")?,
        bot_api_url: row.try_get("bot_api_url")?,
        bot_is_active: row.try_get::<i32, _>("bot_is_active")? != 0,
    })
}

impl Database {
    pub async fn strategy_by_name(&self, name: &str) -> Result<Option<StrategyRecord>, Error> {
        let query = format!("{} WHERE b.bot_name = $1", sql::STRATEGY_SELECT.trim_end());
        let row = sqlx::query(&query)
            .bind(name)
            .fetch_optional(self.pool())
            .await?;
        row.as_ref().map(strategy_from_row).transpose()
    }

    pub async fn strategy_by_bot_id(&self, bot_id: &str) -> Result<Option<StrategyRecord>, Error> {
        let query = format!("{} WHERE b.bot_id = $1", sql::STRATEGY_SELECT.trim_end());
        let row = sqlx::query(&query)
            .bind(bot_id)
            .fetch_optional(self.pool())
            .await?;
        row.as_ref().map(strategy_from_row).transpose()
    }

    pub async fn get_active_strategies(&self) -> Result<Vec<StrategyRecord>, Error> {
        let query = format!(
            "{} WHERE b.is_active = 1 ORDER BY s.id",
            sql::STRATEGY_SELECT.trim_end()
        );
        let rows = sqlx::query(&query).fetch_all(self.pool()).await?;
        rows.iter().map(strategy_from_row).collect()
    }

    /// Names of every strategy row (active or not), keyed by the hosting
    /// bot's name the way discovery reports plugins.
    pub async fn strategy_names(&self) -> Result<Vec<String>, Error> {
        let query = format!("{} ORDER BY s.id", sql::STRATEGY_SELECT.trim_end());
        let rows = sqlx::query(&query).fetch_all(self.pool()).await?;
        rows.iter()
            .map(|row| row.try_get::<String, _>("bot_name").map_err(Error::from))
            .collect()
    }

    pub async fn insert_strategy(&self, strategy: &NewStrategy) -> Result<i64, Error> {
        let row = sqlx::query(sql::INSERT_STRATEGY)
            .bind(&strategy.strategy_name)
            .bind(strategy.bot_pk)
            .bind(&strategy.category)
            .bind(&strategy.tags)
            .bind(&strategy.short_description)
            .bind(&strategy.long_description)
            .fetch_one(self.pool())
            .await?;
        Ok(row.try_get::<i64, _>(0)?)
    }

    pub async fn update_strategy_stats(
        &self,
        strategy_id: i64,
        stats: &StrategyStats,
        refreshed_at: DateTime<Utc>,
    ) -> Result<(), Error> {
        sqlx::query(sql::UPDATE_STRATEGY_STATS)
            .bind(strategy_id)
            .bind(stats.profit_ratio_mean)
            .bind(stats.profit_ratio_sum)
            .bind(stats.profit_ratio)
            .bind(stats.first_trade.map(fmt_ts))
            .bind(stats.latest_trade.map(fmt_ts))
            .bind(&stats.avg_duration)
            .bind(stats.winning_trades)
            .bind(stats.losing_trades)
            .bind(stats.winning_trades + stats.losing_trades)
            .bind(stats.daily_profit)
            .bind(stats.daily_trade_count)
            .bind(stats.weekly_profit)
            .bind(stats.weekly_trade_count)
            .bind(stats.monthly_profit)
            .bind(stats.monthly_trade_count)
            .bind(fmt_ts(refreshed_at))
            .execute(self.pool())
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use coingro_types::State;

    use super::*;
    use crate::persistence::NewBot;

    async fn seed_strategy(db: &Database, name: &str, active: bool) -> i64 {
        let bot_pk = db
            .insert_bot(&NewBot {
                bot_id: name.to_lowercase(),
                user_id: None,
                bot_name: name.to_string(),
                image: "coingro/coingro".to_string(),
                version: "1.0.0".to_string(),
                api_url: format!("http://{}", name.to_lowercase()),
                strategy: Some(name.to_string()),
                exchange: Some("binance".to_string()),
                stake_currency: Some("USDT".to_string()),
                state: Some(State::Running),
                is_strategy: true,
                configuration: None,
            })
            .await
            .unwrap();
        if !active {
            db.deactivate_bot_row(&name.to_lowercase(), false)
                .await
                .unwrap();
        }
        db.insert_strategy(&NewStrategy {
            strategy_name: name.to_string(),
            bot_pk,
            category: Some("trend".to_string()),
            tags: "spot,low-risk".to_string(),
            short_description: Some("short".to_string()),
            long_description: None,
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn active_join_filters_inactive_bots() {
        let db = Database::connect("sqlite://").await.unwrap();
        seed_strategy(&db, "Strategy01", true).await;
        seed_strategy(&db, "Strategy02", false).await;

        let active = db.get_active_strategies().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].bot_name, "Strategy01");
        assert_eq!(active[0].bot_bot_id, "strategy01");

        // Names still include the deactivated plugin's row.
        let names = db.strategy_names().await.unwrap();
        assert_eq!(names, vec!["Strategy01", "Strategy02"]);
    }

    #[tokio::test]
    async fn stats_update_round_trips_and_stamps_refresh() {
        let db = Database::connect("sqlite://").await.unwrap();
        let id = seed_strategy(&db, "Strategy01", true).await;

        let strategy = db.strategy_by_name("Strategy01").await.unwrap().unwrap();
        assert!(strategy.needs_refresh(Utc::now(), chrono::Duration::hours(1)));

        let now = Utc::now();
        db.update_strategy_stats(
            id,
            &StrategyStats {
                profit_ratio_mean: 0.02,
                profit_ratio_sum: 0.4,
                profit_ratio: 0.39,
                winning_trades: 12,
                losing_trades: 8,
                daily_profit: 0.01,
                daily_trade_count: 3,
                ..Default::default()
            },
            now,
        )
        .await
        .unwrap();

        let strategy = db.strategy_by_name("Strategy01").await.unwrap().unwrap();
        assert_eq!(strategy.trade_count, 20);
        assert_eq!(strategy.daily_trade_count, 3);
        assert!(!strategy.needs_refresh(Utc::now(), chrono::Duration::hours(1)));
        assert!(strategy.needs_refresh(
            Utc::now() + chrono::Duration::hours(2),
            chrono::Duration::hours(1)
        ));
    }

    #[tokio::test]
    async fn tags_split_into_list() {
        let db = Database::connect("sqlite://").await.unwrap();
        seed_strategy(&db, "Strategy01", true).await;
        let strategy = db.strategy_by_bot_id("strategy01").await.unwrap().unwrap();
        assert_eq!(strategy.split_tags(), vec!["spot", "low-risk"]);
        let mini = strategy.to_mini();
        assert_eq!(mini.name, "Strategy01");
        assert_eq!(mini.bot_id, strategy.bot_pk);
    }
}
