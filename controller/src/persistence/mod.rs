use chrono::{DateTime, Utc};
use owo_colors::OwoColorize;
use sqlx::{AnyPool, any::AnyPoolOptions};

use crate::{constants::DATETIME_PRINT_FORMAT, error::Error};

mod bot;
mod strategy;
mod user;

pub use bot::{BotRecord, NewBot};
pub use strategy::{NewStrategy, StrategyRecord, StrategyStats};
pub use user::UserRecord;

pub(crate) mod sql {
    pub const TABLES_SQLITE: &str = include_str!("sql/tables_sqlite.sql");
    pub const TABLES_POSTGRES: &str = include_str!("sql/tables_postgres.sql");

    pub const BOT_BY_ID: &str = include_str!("sql/bot_by_id.sql");
    pub const GET_ACTIVE_BOTS: &str = include_str!("sql/get_active_bots.sql");
    pub const GET_STRATEGY_BOTS: &str = include_str!("sql/get_strategy_bots.sql");
    pub const INSERT_BOT: &str = include_str!("sql/insert_bot.sql");
    pub const UPDATE_BOT_PROVISION: &str = include_str!("sql/update_bot_provision.sql");
    pub const DEACTIVATE_BOT: &str = include_str!("sql/deactivate_bot.sql");
    pub const UPDATE_BOT_STATE: &str = include_str!("sql/update_bot_state.sql");
    pub const UPDATE_BOT_EXCHANGE: &str = include_str!("sql/update_bot_exchange.sql");
    pub const UPDATE_BOT_STRATEGY: &str = include_str!("sql/update_bot_strategy.sql");
    pub const UPDATE_BOT_SETTINGS: &str = include_str!("sql/update_bot_settings.sql");
    pub const UPDATE_BOT_CONFIGURATION: &str = include_str!("sql/update_bot_configuration.sql");

    pub const STRATEGY_SELECT: &str = include_str!("sql/strategy_select.sql");
    pub const INSERT_STRATEGY: &str = include_str!("sql/insert_strategy.sql");
    pub const UPDATE_STRATEGY_STATS: &str = include_str!("sql/update_strategy_stats.sql");

    pub const USER_BY_ID: &str = include_str!("sql/user_by_id.sql");
    pub const INSERT_USER: &str = include_str!("sql/insert_user.sql");
}

#[derive(Clone)]
pub struct Database {
    pool: AnyPool,
}

impl Database {
    /// Opens the store named by `db_url` and ensures the schema exists.
    /// Sqlite (the default, file-backed or in-memory) and postgres are
    /// supported.
    pub async fn connect(db_url: &str) -> Result<Self, Error> {
        sqlx::any::install_default_drivers();
        let url = normalize_db_url(db_url)?;
        let in_memory = url.contains(":memory:");
        let pool = AnyPoolOptions::new()
            // A shared in-memory sqlite database exists per connection.
            .max_connections(if in_memory { 1 } else { 5 })
            .connect(&url)
            .await?;
        let db = Self { pool };
        db.create_tables(&url).await?;
        println!("{}", "🗄️ Database tables ensured.".green());
        Ok(db)
    }

    pub(crate) fn pool(&self) -> &AnyPool {
        &self.pool
    }

    async fn create_tables(&self, url: &str) -> Result<(), Error> {
        let ddl = if url.starts_with("sqlite") {
            sql::TABLES_SQLITE
        } else {
            sql::TABLES_POSTGRES
        };
        for stmt in strip_sql_comments(ddl).split(';') {
            let stmt = stmt.trim();
            if stmt.is_empty() {
                continue;
            }
            sqlx::query(stmt).execute(&self.pool).await?;
        }
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Maps the sqlalchemy-style urls of the original deployment configs onto
/// what sqlx expects; rejects the ambiguous empty-path form.
pub fn normalize_db_url(db_url: &str) -> Result<String, Error> {
    if db_url == "sqlite:///" {
        return Err(Error::operational(format!(
            "Bad db-url {}. For an in-memory database, please use `sqlite://`.",
            db_url
        )));
    }
    if db_url == "sqlite://" {
        return Ok("sqlite::memory:".to_string());
    }
    let url = match db_url.strip_prefix("sqlite:///") {
        Some(path) => format!("sqlite://{}", path),
        None => db_url.to_string(),
    };
    if url.starts_with("sqlite://") && !url.contains('?') {
        // Create the file on first start.
        return Ok(format!("{}?mode=rwc", url));
    }
    Ok(url)
}

pub(crate) fn strip_sql_comments(input: &str) -> String {
    let mut output = String::new();
    for line in input.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("--") || trimmed.is_empty() {
            continue;
        }
        if let Some(pos) = line.find("--") {
            output.push_str(&line[..pos]);
            output.push('\n');
        } else {
            output.push_str(line);
            output.push('\n');
        }
    }
    output
}

pub(crate) fn fmt_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339()
}

pub(crate) fn parse_ts(raw: Option<String>) -> Result<Option<DateTime<Utc>>, Error> {
    match raw {
        None => Ok(None),
        Some(raw) => {
            let parsed = DateTime::parse_from_rfc3339(raw.trim())
                .map_err(|e| Error::operational(format!("Invalid timestamp '{}': {}", raw, e)))?;
            Ok(Some(parsed.with_timezone(&Utc)))
        }
    }
}

/// Human-facing timestamp rendering used by the API responses.
pub fn print_ts(ts: DateTime<Utc>) -> String {
    ts.format(DATETIME_PRINT_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlalchemy_urls_are_normalized() {
        assert_eq!(
            normalize_db_url("sqlite:///controllerv1.sqlite").unwrap(),
            "sqlite://controllerv1.sqlite?mode=rwc"
        );
        assert_eq!(normalize_db_url("sqlite://").unwrap(), "sqlite::memory:");
        assert!(normalize_db_url("sqlite:///").is_err());
        assert_eq!(
            normalize_db_url("postgres://cg@db/coingro").unwrap(),
            "postgres://cg@db/coingro"
        );
    }

    #[test]
    fn timestamps_round_trip() {
        let now = Utc::now();
        let parsed = parse_ts(Some(fmt_ts(now))).unwrap().unwrap();
        assert_eq!(parsed.timestamp_millis(), now.timestamp_millis());
        assert!(parse_ts(None).unwrap().is_none());
        assert!(parse_ts(Some("garbage".into())).is_err());
    }

    #[tokio::test]
    async fn schema_is_created_in_memory() {
        let db = Database::connect("sqlite://").await.unwrap();
        // Idempotent: a second pass over the DDL must not fail.
        db.create_tables("sqlite::memory:").await.unwrap();
        assert!(db.bot_by_id("missing").await.unwrap().is_none());
        assert!(db.get_active_bots().await.unwrap().is_empty());
        assert!(db.get_active_strategies().await.unwrap().is_empty());
        assert!(db.user_by_id(1).await.unwrap().is_none());
    }
}
