//! Wire schemas for the controller API and for the responses proxied from
//! individual bot APIs. Proxied responses are decoded against these types
//! purely to validate their shape; the raw upstream JSON is what the caller
//! receives, so every decoder tolerates unknown fields.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct Ping {
    pub status: String,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct Version {
    pub version: String,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct StatusMsg {
    pub status: String,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct ResultMsg {
    pub result: String,
}

/// Response to `POST /create_bot`.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct BotStatus {
    pub status: String,
    pub bot_id: String,
    pub bot_name: String,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct SysInfo {
    pub cpu_pct: Vec<f32>,
    pub ram_pct: f32,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct Health {
    pub last_process: String,
    pub last_process_loc: String,
    pub last_process_ts: i64,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct BotState {
    pub state: String,
}

// ---------------------------------------------------------------------------
// Strategy listing (controller-local)
// ---------------------------------------------------------------------------

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Default)]
pub struct StrategyMini {
    pub name: String,
    pub bot_id: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_description: Option<String>,

    pub daily_profit: f64,
    pub daily_trade_count: i64,
    pub weekly_profit: f64,
    pub weekly_trade_count: i64,
    pub monthly_profit: f64,
    pub monthly_trade_count: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_refresh: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Default)]
pub struct StrategyResponse {
    #[serde(flatten)]
    pub mini: StrategyMini,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub long_description: Option<String>,

    pub profit_ratio_mean: f64,
    pub profit_ratio_sum: f64,
    pub profit_ratio: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trade_count: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_trade: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_trade: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_duration: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winning_trades: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub losing_trades: Option<i64>,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Default)]
pub struct StrategyListResponse {
    pub strategies: Vec<StrategyMini>,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Default)]
pub struct ExchangeOptions {
    pub required_credentials: Vec<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Default)]
pub struct SettingsOptions {
    pub exchanges: BTreeMap<String, ExchangeOptions>,
    pub stake_currencies: Vec<String>,
    pub forceenter_quote_currencies: Vec<String>,
    pub fiat_display_currencies: Vec<String>,
}

// ---------------------------------------------------------------------------
// Proxied bot API decoders
// ---------------------------------------------------------------------------

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct CurrencyBalance {
    pub currency: String,
    pub free: f64,
    pub balance: f64,
    pub used: f64,

    #[serde(default)]
    pub est_stake: f64,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct Balances {
    pub currencies: Vec<CurrencyBalance>,
    pub total: f64,
    pub stake: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,

    #[serde(default)]
    pub value: f64,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct Count {
    pub current: i64,
    pub max: i64,
    pub total_stake: f64,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct PerformanceEntry {
    pub pair: String,
    pub profit: f64,
    pub count: i64,

    #[serde(default)]
    pub profit_abs: f64,
}

/// Profit summary; the fields the strategy refresh copies into the database
/// are required, everything else is tolerated.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct Profit {
    pub profit_all_ratio_mean: f64,
    pub profit_all_ratio_sum: f64,
    pub profit_all_ratio: f64,

    /// Milliseconds since the epoch.
    pub first_trade_timestamp: i64,

    /// Milliseconds since the epoch.
    pub latest_trade_timestamp: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_duration: Option<String>,

    pub winning_trades: i64,
    pub losing_trades: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trade_count: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profit_factor: Option<f64>,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Default)]
pub struct DurationStats {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wins: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draws: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub losses: Option<f64>,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct Stats {
    pub durations: DurationStats,

    #[serde(default)]
    pub exit_reasons: BTreeMap<String, serde_json::Value>,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Default)]
pub struct TimeUnitEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,

    #[serde(default)]
    pub abs_profit: f64,

    pub rel_profit: f64,
    pub trade_count: i64,

    #[serde(default)]
    pub fiat_value: f64,
}

/// Shared shape of `daily` and `timeunit_profit` responses.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Default)]
pub struct TimeUnitProfit {
    pub data: Vec<TimeUnitEntry>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stake_currency: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fiat_display_currency: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Default)]
pub struct TradeSummary {
    pub daily: TimeUnitProfit,
    pub weekly: TimeUnitProfit,
    pub monthly: TimeUnitProfit,
}

/// `GET /summary` aggregates one-unit windows of each timeframe.
pub type SummaryResponse = TradeSummary;

/// Open (or historical) trade as reported by a bot. Only the identifying
/// fields are required; trade rows carry dozens of optional metrics.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct TradeSchema {
    pub trade_id: i64,
    pub pair: String,

    #[serde(default)]
    pub is_open: bool,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct DeleteTrade {
    pub trade_id: i64,
    pub result_msg: String,

    #[serde(default)]
    pub cancel_order_count: i64,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct ShowConfig {
    pub state: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dry_run: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exchange: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stake_currency: Option<String>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Default)]
pub struct BlacklistResponse {
    pub blacklist: Vec<String>,

    #[serde(default)]
    pub blacklist_expanded: Vec<String>,

    #[serde(default)]
    pub length: i64,

    #[serde(default)]
    pub method: Vec<String>,

    #[serde(default)]
    pub errors: BTreeMap<String, serde_json::Value>,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Default)]
pub struct WhitelistResponse {
    pub whitelist: Vec<String>,

    #[serde(default)]
    pub length: i64,

    #[serde(default)]
    pub method: Vec<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Default)]
pub struct Locks {
    pub lock_count: i64,

    #[serde(default)]
    pub locks: Vec<serde_json::Value>,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Default)]
pub struct Logs {
    pub log_count: i64,

    #[serde(default)]
    pub logs: Vec<serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Request payloads forwarded to bots
// ---------------------------------------------------------------------------

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Default)]
pub struct ForceEnterPayload {
    pub pair: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub side: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ordertype: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stakeamount: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_tag: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Default)]
pub struct ForceExitPayload {
    pub tradeid: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ordertype: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Default)]
pub struct BlacklistPayload {
    pub blacklist: Vec<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Default)]
pub struct DeleteLockRequest {
    pub lockid: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pair: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Default)]
pub struct UpdateExchangePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dry_run: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Default)]
pub struct UpdateStrategyPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimal_roi: Option<BTreeMap<String, f64>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stoploss: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trailing_stop: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trailing_stop_positive: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trailing_stop_positive_offset: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trailing_only_offset_is_reached: Option<bool>,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Default)]
pub struct UpdateSettingsPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_open_trades: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stake_currency: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stake_amount: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tradable_balance_ratio: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fiat_display_currency: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available_capital: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dry_run_wallet: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profit_decoder_requires_refresh_fields() {
        let ok = serde_json::json!({
            "profit_all_ratio_mean": 0.02,
            "profit_all_ratio_sum": 0.4,
            "profit_all_ratio": 0.39,
            "first_trade_timestamp": 1_651_000_000_000_i64,
            "latest_trade_timestamp": 1_652_000_000_000_i64,
            "avg_duration": "0:45:00",
            "winning_trades": 12,
            "losing_trades": 8,
            "unrelated_metric": 1.0,
        });
        assert!(serde_json::from_value::<Profit>(ok).is_ok());

        let missing = serde_json::json!({"profit_all_ratio": 0.1});
        assert!(serde_json::from_value::<Profit>(missing).is_err());
    }

    #[test]
    fn trade_schema_keeps_unknown_fields() {
        let raw = serde_json::json!({
            "trade_id": 7,
            "pair": "ETH/USDT",
            "is_open": true,
            "open_rate": 1800.5,
        });
        let trade: TradeSchema = serde_json::from_value(raw).unwrap();
        assert_eq!(trade.trade_id, 7);
        assert_eq!(trade.extra["open_rate"], serde_json::json!(1800.5));
    }

    #[test]
    fn error_body_is_not_a_status_msg() {
        let detail = serde_json::json!({"detail": "bot is already running"});
        assert!(serde_json::from_value::<StatusMsg>(detail).is_err());
    }
}
