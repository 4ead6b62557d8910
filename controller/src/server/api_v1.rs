//! Handlers for `/api/v1`. Three classes: controller-local endpoints,
//! bot-lifecycle endpoints delegating to the reconciler, and the per-bot
//! proxy. Proxied responses are decoded against the expected schema; a
//! mismatch surfaces the upstream payload as a 400, a transport failure as
//! a 502.

use axum::{
    Json,
    extract::{Path, Query, RawQuery, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use coingro_common::response;
use coingro_types::{MaxOpenTrades, State as RunState, api};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::{Value, json};

use super::{App, deps, deps::BotQuery};
use crate::{
    constants::{
        CONTROLLER_VERSION, DATETIME_PRINT_FORMAT, SUPPORTED_EXCHANGES, SUPPORTED_FIAT,
        SUPPORTED_FORCEENTER_CURRENCIES, SUPPORTED_STAKE_CURRENCIES,
    },
    error::Error,
    persistence::BotRecord,
};

fn proxy_err(e: Error) -> Response {
    response::bad_gateway(e)
}

/// A response that fails schema validation is assumed to be the bot's own
/// error body: its `detail` (or the whole payload) comes back as a 400.
fn upstream_reject(value: Value) -> Response {
    let detail = value.get("detail").cloned().unwrap_or(value);
    (StatusCode::BAD_REQUEST, Json(json!({ "detail": detail }))).into_response()
}

/// Validates the upstream value against `T`, passing the raw JSON through
/// untouched on success.
fn validated<T: DeserializeOwned>(result: Result<Value, Error>) -> Result<Value, Response> {
    match result {
        Ok(value) => match serde_json::from_value::<T>(value.clone()) {
            Ok(_) => Ok(value),
            Err(_) => Err(upstream_reject(value)),
        },
        Err(e) => Err(proxy_err(e)),
    }
}

fn respond<T: DeserializeOwned>(result: Result<Value, Error>) -> Response {
    match validated::<T>(result) {
        Ok(value) => (StatusCode::OK, Json(value)).into_response(),
        Err(resp) => resp,
    }
}

fn respond_raw(result: Result<Value, Error>) -> Response {
    match result {
        Ok(value) => (StatusCode::OK, Json(value)).into_response(),
        Err(e) => proxy_err(e),
    }
}

/// Decodes repeated query keys (`?key=a&key=b`) the way the bot API expects
/// them; axum's `Query` extractor only sees the last occurrence.
fn query_values(query: &str, key: &str) -> Vec<String> {
    query
        .split('&')
        .filter_map(|pair| {
            let (k, v) = pair.split_once('=')?;
            if k != key {
                return None;
            }
            let v = v.replace('+', " ");
            Some(
                percent_encoding::percent_decode_str(&v)
                    .decode_utf8_lossy()
                    .into_owned(),
            )
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Controller-local endpoints
// ---------------------------------------------------------------------------

pub async fn ping() -> Response {
    Json(json!({ "status": "pong" })).into_response()
}

pub async fn controller_version() -> Response {
    Json(json!({ "version": CONTROLLER_VERSION })).into_response()
}

pub async fn controller_sysinfo() -> Response {
    let mut sys = sysinfo::System::new();
    sys.refresh_cpu_usage();
    tokio::time::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL).await;
    sys.refresh_cpu_usage();
    sys.refresh_memory();
    let cpu_pct: Vec<f32> = sys.cpus().iter().map(|cpu| cpu.cpu_usage()).collect();
    let ram_pct = if sys.total_memory() > 0 {
        sys.used_memory() as f32 / sys.total_memory() as f32 * 100.0
    } else {
        0.0
    };
    Json(api::SysInfo { cpu_pct, ram_pct }).into_response()
}

pub async fn controller_health(State(app): State<App>) -> Response {
    let controller = app.controller().await;
    let last = controller.last_process();
    Json(api::Health {
        last_process: last.to_string(),
        last_process_loc: last
            .with_timezone(&chrono::Local)
            .format(DATETIME_PRINT_FORMAT)
            .to_string(),
        last_process_ts: last.timestamp(),
    })
    .into_response()
}

pub async fn list_strategies(State(app): State<App>) -> Response {
    let controller = app.controller().await;
    match controller.db().get_active_strategies().await {
        Ok(strategies) => Json(api::StrategyListResponse {
            strategies: strategies.iter().map(|s| s.to_mini()).collect(),
        })
        .into_response(),
        Err(e) => response::error(e),
    }
}

pub async fn get_strategy(State(app): State<App>, Path(strategy): Path<String>) -> Response {
    let controller = app.controller().await;
    match controller.db().strategy_by_name(&strategy).await {
        Ok(Some(record)) => Json(record.to_response()).into_response(),
        Ok(None) => response::not_found(anyhow::anyhow!(
            "Could not find strategy {}.",
            strategy
        )),
        Err(e) => response::error(e),
    }
}

pub async fn settings_options() -> Response {
    let exchanges = SUPPORTED_EXCHANGES
        .iter()
        .map(|(name, credentials)| {
            (
                name.to_string(),
                api::ExchangeOptions {
                    required_credentials: credentials.iter().map(|c| c.to_string()).collect(),
                },
            )
        })
        .collect();
    Json(api::SettingsOptions {
        exchanges,
        stake_currencies: SUPPORTED_STAKE_CURRENCIES
            .iter()
            .map(|c| c.to_string())
            .collect(),
        forceenter_quote_currencies: SUPPORTED_FORCEENTER_CURRENCIES
            .iter()
            .map(|c| c.to_string())
            .collect(),
        fiat_display_currencies: SUPPORTED_FIAT.iter().map(|c| c.to_string()).collect(),
    })
    .into_response()
}

// ---------------------------------------------------------------------------
// Bot lifecycle
// ---------------------------------------------------------------------------

pub async fn create_bot(State(app): State<App>, headers: HeaderMap) -> Response {
    let controller = app.controller().await;
    let user = match deps::get_user(controller.db(), &headers).await {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    match controller
        .create_bot(None, None, Some(user.id), false, false, Default::default())
        .await
    {
        Ok((bot_id, bot_name)) => Json(api::BotStatus {
            status: "Successfully created coingro bot.".to_string(),
            bot_id,
            bot_name,
        })
        .into_response(),
        Err(e) => response::bad_gateway(anyhow::anyhow!("Could not create bot due to {}.", e)),
    }
}

pub async fn activate_bot(
    State(app): State<App>,
    headers: HeaderMap,
    Query(query): Query<BotQuery>,
) -> Response {
    let controller = app.controller().await;
    let bot = match deps::get_bot(controller.db(), &headers, &query.bot_id).await {
        Ok(bot) => bot,
        Err(resp) => return resp,
    };
    match controller
        .create_bot(
            Some(&bot.bot_id),
            None,
            None,
            bot.is_strategy,
            false,
            Default::default(),
        )
        .await
    {
        Ok(_) => Json(api::StatusMsg {
            status: "Successfully activated coingro bot.".to_string(),
        })
        .into_response(),
        Err(e) => response::bad_gateway(anyhow::anyhow!("Could not activate bot due to {}.", e)),
    }
}

pub async fn deactivate_bot(
    State(app): State<App>,
    headers: HeaderMap,
    Query(query): Query<BotQuery>,
) -> Response {
    let controller = app.controller().await;
    let bot = match deps::get_bot(controller.db(), &headers, &query.bot_id).await {
        Ok(bot) => bot,
        Err(resp) => return resp,
    };
    match controller.deactivate_bot(&bot.bot_id, false).await {
        Ok(_) => Json(api::StatusMsg {
            status: "Successfully deactivated coingro bot.".to_string(),
        })
        .into_response(),
        Err(e) => response::bad_gateway(anyhow::anyhow!("Could not deactivate bot due to {}.", e)),
    }
}

pub async fn delete_bot(
    State(app): State<App>,
    headers: HeaderMap,
    Query(query): Query<BotQuery>,
) -> Response {
    let controller = app.controller().await;
    let bot = match deps::get_bot(controller.db(), &headers, &query.bot_id).await {
        Ok(bot) => bot,
        Err(resp) => return resp,
    };
    match controller.deactivate_bot(&bot.bot_id, true).await {
        Ok(_) => Json(api::StatusMsg {
            status: "Successfully deleted coingro bot.".to_string(),
        })
        .into_response(),
        Err(e) => response::bad_gateway(anyhow::anyhow!("Could not delete bot due to {}.", e)),
    }
}

// ---------------------------------------------------------------------------
// Per-bot proxy
// ---------------------------------------------------------------------------

async fn resolve(
    app: &App,
    headers: &HeaderMap,
    bot_id: &str,
) -> Result<(crate::controller::Controller, BotRecord), Response> {
    let controller = app.controller().await;
    let bot = deps::get_bot(controller.db(), headers, bot_id).await?;
    Ok((controller, bot))
}

pub async fn version(
    State(app): State<App>,
    headers: HeaderMap,
    Query(query): Query<BotQuery>,
) -> Response {
    let (controller, bot) = match resolve(&app, &headers, &query.bot_id).await {
        Ok(ok) => ok,
        Err(resp) => return resp,
    };
    respond::<api::Version>(controller.client().version(&bot.api_url).await)
}

pub async fn balance(
    State(app): State<App>,
    headers: HeaderMap,
    Query(query): Query<BotQuery>,
) -> Response {
    let (controller, bot) = match resolve(&app, &headers, &query.bot_id).await {
        Ok(ok) => ok,
        Err(resp) => return resp,
    };
    respond::<api::Balances>(controller.client().balance(&bot.api_url).await)
}

pub async fn count(
    State(app): State<App>,
    headers: HeaderMap,
    Query(query): Query<BotQuery>,
) -> Response {
    let (controller, bot) = match resolve(&app, &headers, &query.bot_id).await {
        Ok(ok) => ok,
        Err(resp) => return resp,
    };
    respond::<api::Count>(controller.client().count(&bot.api_url).await)
}

pub async fn performance(
    State(app): State<App>,
    headers: HeaderMap,
    Query(query): Query<BotQuery>,
) -> Response {
    let (controller, bot) = match resolve(&app, &headers, &query.bot_id).await {
        Ok(ok) => ok,
        Err(resp) => return resp,
    };
    respond::<Vec<api::PerformanceEntry>>(controller.client().performance(&bot.api_url).await)
}

pub async fn profit(
    State(app): State<App>,
    headers: HeaderMap,
    Query(query): Query<BotQuery>,
) -> Response {
    let (controller, bot) = match resolve(&app, &headers, &query.bot_id).await {
        Ok(ok) => ok,
        Err(resp) => return resp,
    };
    respond::<api::Profit>(controller.client().profit(&bot.api_url).await)
}

pub async fn stats(
    State(app): State<App>,
    headers: HeaderMap,
    Query(query): Query<BotQuery>,
) -> Response {
    let (controller, bot) = match resolve(&app, &headers, &query.bot_id).await {
        Ok(ok) => ok,
        Err(resp) => return resp,
    };
    respond::<api::Stats>(controller.client().stats(&bot.api_url).await)
}

#[derive(Deserialize)]
pub struct DailyQuery {
    #[serde(rename = "botId", alias = "botid")]
    bot_id: String,

    #[serde(default = "default_daily_timescale")]
    timescale: i64,
}

fn default_daily_timescale() -> i64 {
    7
}

pub async fn daily(
    State(app): State<App>,
    headers: HeaderMap,
    Query(query): Query<DailyQuery>,
) -> Response {
    let (controller, bot) = match resolve(&app, &headers, &query.bot_id).await {
        Ok(ok) => ok,
        Err(resp) => return resp,
    };
    respond::<api::TimeUnitProfit>(
        controller
            .client()
            .daily(&bot.api_url, Some(query.timescale))
            .await,
    )
}

pub async fn status(
    State(app): State<App>,
    headers: HeaderMap,
    Query(query): Query<BotQuery>,
) -> Response {
    let (controller, bot) = match resolve(&app, &headers, &query.bot_id).await {
        Ok(ok) => ok,
        Err(resp) => return resp,
    };
    respond::<Vec<api::TradeSchema>>(controller.client().status(&bot.api_url).await)
}

#[derive(Deserialize)]
pub struct TradesQuery {
    #[serde(rename = "botId", alias = "botid")]
    bot_id: String,

    #[serde(default = "default_trades_limit")]
    limit: i64,

    #[serde(default)]
    offset: i64,
}

fn default_trades_limit() -> i64 {
    500
}

/// Validating large trade histories costs more than it protects; the
/// payload passes through untouched.
pub async fn trades(
    State(app): State<App>,
    headers: HeaderMap,
    Query(query): Query<TradesQuery>,
) -> Response {
    let (controller, bot) = match resolve(&app, &headers, &query.bot_id).await {
        Ok(ok) => ok,
        Err(resp) => return resp,
    };
    respond_raw(
        controller
            .client()
            .trades(&bot.api_url, Some(query.limit), Some(query.offset))
            .await,
    )
}

pub async fn trade(
    State(app): State<App>,
    headers: HeaderMap,
    Path(tradeid): Path<i64>,
    Query(query): Query<BotQuery>,
) -> Response {
    let (controller, bot) = match resolve(&app, &headers, &query.bot_id).await {
        Ok(ok) => ok,
        Err(resp) => return resp,
    };
    respond::<api::TradeSchema>(controller.client().trade(&bot.api_url, tradeid).await)
}

pub async fn trades_delete(
    State(app): State<App>,
    headers: HeaderMap,
    Path(tradeid): Path<i64>,
    Query(query): Query<BotQuery>,
) -> Response {
    let (controller, bot) = match resolve(&app, &headers, &query.bot_id).await {
        Ok(ok) => ok,
        Err(resp) => return resp,
    };
    respond::<api::DeleteTrade>(controller.client().delete_trade(&bot.api_url, tradeid).await)
}

pub async fn show_config(
    State(app): State<App>,
    headers: HeaderMap,
    Query(query): Query<BotQuery>,
) -> Response {
    let (controller, bot) = match resolve(&app, &headers, &query.bot_id).await {
        Ok(ok) => ok,
        Err(resp) => return resp,
    };
    respond::<api::ShowConfig>(controller.client().show_config(&bot.api_url).await)
}

pub async fn forceenter(
    State(app): State<App>,
    headers: HeaderMap,
    Query(query): Query<BotQuery>,
    Json(payload): Json<api::ForceEnterPayload>,
) -> Response {
    let (controller, bot) = match resolve(&app, &headers, &query.bot_id).await {
        Ok(ok) => ok,
        Err(resp) => return resp,
    };
    respond::<api::TradeSchema>(controller.client().forceenter(&bot.api_url, &payload).await)
}

pub async fn forceexit(
    State(app): State<App>,
    headers: HeaderMap,
    Query(query): Query<BotQuery>,
    Json(payload): Json<api::ForceExitPayload>,
) -> Response {
    let (controller, bot) = match resolve(&app, &headers, &query.bot_id).await {
        Ok(ok) => ok,
        Err(resp) => return resp,
    };
    respond::<api::ResultMsg>(controller.client().forceexit(&bot.api_url, &payload).await)
}

pub async fn blacklist(
    State(app): State<App>,
    headers: HeaderMap,
    Query(query): Query<BotQuery>,
) -> Response {
    let (controller, bot) = match resolve(&app, &headers, &query.bot_id).await {
        Ok(ok) => ok,
        Err(resp) => return resp,
    };
    respond::<api::BlacklistResponse>(controller.client().blacklist(&bot.api_url).await)
}

pub async fn blacklist_post(
    State(app): State<App>,
    headers: HeaderMap,
    Query(query): Query<BotQuery>,
    Json(payload): Json<api::BlacklistPayload>,
) -> Response {
    let (controller, bot) = match resolve(&app, &headers, &query.bot_id).await {
        Ok(ok) => ok,
        Err(resp) => return resp,
    };
    respond::<api::BlacklistResponse>(
        controller
            .client()
            .add_blacklist(&bot.api_url, &payload)
            .await,
    )
}

pub async fn blacklist_delete(
    State(app): State<App>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> Response {
    let query = query.unwrap_or_default();
    let bot_id = query_values(&query, "botId")
        .into_iter()
        .chain(query_values(&query, "botid"))
        .next();
    let Some(bot_id) = bot_id else {
        return response::bad_request(anyhow::anyhow!("Missing botId"));
    };
    let pairs_to_delete = query_values(&query, "pairs_to_delete");
    let (controller, bot) = match resolve(&app, &headers, &bot_id).await {
        Ok(ok) => ok,
        Err(resp) => return resp,
    };
    respond::<api::BlacklistResponse>(
        controller
            .client()
            .delete_blacklist(&bot.api_url, &pairs_to_delete)
            .await,
    )
}

pub async fn whitelist(
    State(app): State<App>,
    headers: HeaderMap,
    Query(query): Query<BotQuery>,
) -> Response {
    let (controller, bot) = match resolve(&app, &headers, &query.bot_id).await {
        Ok(ok) => ok,
        Err(resp) => return resp,
    };
    respond::<api::WhitelistResponse>(controller.client().whitelist(&bot.api_url).await)
}

pub async fn locks(
    State(app): State<App>,
    headers: HeaderMap,
    Query(query): Query<BotQuery>,
) -> Response {
    let (controller, bot) = match resolve(&app, &headers, &query.bot_id).await {
        Ok(ok) => ok,
        Err(resp) => return resp,
    };
    respond::<api::Locks>(controller.client().locks(&bot.api_url).await)
}

pub async fn delete_lock(
    State(app): State<App>,
    headers: HeaderMap,
    Path(lockid): Path<i64>,
    Query(query): Query<BotQuery>,
) -> Response {
    let (controller, bot) = match resolve(&app, &headers, &query.bot_id).await {
        Ok(ok) => ok,
        Err(resp) => return resp,
    };
    respond::<api::Locks>(controller.client().delete_lock(&bot.api_url, lockid).await)
}

pub async fn delete_lock_pair(
    State(app): State<App>,
    headers: HeaderMap,
    Query(query): Query<BotQuery>,
    Json(payload): Json<api::DeleteLockRequest>,
) -> Response {
    let (controller, bot) = match resolve(&app, &headers, &query.bot_id).await {
        Ok(ok) => ok,
        Err(resp) => return resp,
    };
    respond::<api::Locks>(
        controller
            .client()
            .delete_lock_pair(&bot.api_url, &payload)
            .await,
    )
}

#[derive(Deserialize)]
pub struct LogsQuery {
    #[serde(rename = "botId", alias = "botid")]
    bot_id: String,

    #[serde(default)]
    limit: Option<i64>,
}

pub async fn logs(
    State(app): State<App>,
    headers: HeaderMap,
    Query(query): Query<LogsQuery>,
) -> Response {
    let (controller, bot) = match resolve(&app, &headers, &query.bot_id).await {
        Ok(ok) => ok,
        Err(resp) => return resp,
    };
    respond::<api::Logs>(controller.client().logs(&bot.api_url, query.limit).await)
}

pub async fn start(
    State(app): State<App>,
    headers: HeaderMap,
    Query(query): Query<BotQuery>,
) -> Response {
    let (controller, bot) = match resolve(&app, &headers, &query.bot_id).await {
        Ok(ok) => ok,
        Err(resp) => return resp,
    };
    match validated::<api::StatusMsg>(controller.client().start(&bot.api_url).await) {
        Ok(value) => {
            if let Err(e) = controller
                .db()
                .update_bot_state(&bot.bot_id, RunState::Running)
                .await
            {
                return response::error(e);
            }
            (StatusCode::OK, Json(value)).into_response()
        }
        Err(resp) => resp,
    }
}

pub async fn stop(
    State(app): State<App>,
    headers: HeaderMap,
    Query(query): Query<BotQuery>,
) -> Response {
    let (controller, bot) = match resolve(&app, &headers, &query.bot_id).await {
        Ok(ok) => ok,
        Err(resp) => return resp,
    };
    match validated::<api::StatusMsg>(controller.client().stop(&bot.api_url).await) {
        Ok(value) => {
            if let Err(e) = controller
                .db()
                .update_bot_state(&bot.bot_id, RunState::Stopped)
                .await
            {
                return response::error(e);
            }
            (StatusCode::OK, Json(value)).into_response()
        }
        Err(resp) => resp,
    }
}

pub async fn stop_buy(
    State(app): State<App>,
    headers: HeaderMap,
    Query(query): Query<BotQuery>,
) -> Response {
    let (controller, bot) = match resolve(&app, &headers, &query.bot_id).await {
        Ok(ok) => ok,
        Err(resp) => return resp,
    };
    respond::<api::StatusMsg>(controller.client().stopbuy(&bot.api_url).await)
}

pub async fn reload_config(
    State(app): State<App>,
    headers: HeaderMap,
    Query(query): Query<BotQuery>,
) -> Response {
    let (controller, bot) = match resolve(&app, &headers, &query.bot_id).await {
        Ok(ok) => ok,
        Err(resp) => return resp,
    };
    respond::<api::StatusMsg>(controller.client().reload_config(&bot.api_url).await)
}

pub async fn sysinfo(
    State(app): State<App>,
    headers: HeaderMap,
    Query(query): Query<BotQuery>,
) -> Response {
    let (controller, bot) = match resolve(&app, &headers, &query.bot_id).await {
        Ok(ok) => ok,
        Err(resp) => return resp,
    };
    respond::<api::SysInfo>(controller.client().sysinfo(&bot.api_url).await)
}

pub async fn health(
    State(app): State<App>,
    headers: HeaderMap,
    Query(query): Query<BotQuery>,
) -> Response {
    let (controller, bot) = match resolve(&app, &headers, &query.bot_id).await {
        Ok(ok) => ok,
        Err(resp) => return resp,
    };
    respond::<api::Health>(controller.client().health(&bot.api_url).await)
}

pub async fn state(
    State(app): State<App>,
    headers: HeaderMap,
    Query(query): Query<BotQuery>,
) -> Response {
    let (controller, bot) = match resolve(&app, &headers, &query.bot_id).await {
        Ok(ok) => ok,
        Err(resp) => return resp,
    };
    respond::<api::BotState>(controller.client().state(&bot.api_url).await)
}

pub async fn update_exchange(
    State(app): State<App>,
    headers: HeaderMap,
    Query(query): Query<BotQuery>,
    Json(payload): Json<api::UpdateExchangePayload>,
) -> Response {
    let (controller, bot) = match resolve(&app, &headers, &query.bot_id).await {
        Ok(ok) => ok,
        Err(resp) => return resp,
    };
    match validated::<api::StatusMsg>(
        controller
            .client()
            .update_exchange(&bot.api_url, &payload)
            .await,
    ) {
        Ok(value) => {
            if let Err(e) = apply_exchange_update(&controller, &bot, &payload).await {
                return response::error(e);
            }
            (StatusCode::OK, Json(value)).into_response()
        }
        Err(resp) => resp,
    }
}

async fn apply_exchange_update(
    controller: &crate::controller::Controller,
    bot: &BotRecord,
    payload: &api::UpdateExchangePayload,
) -> Result<(), Error> {
    if let Some(name) = &payload.name {
        controller.db().update_bot_exchange(&bot.bot_id, name).await?;
    }
    if payload.name.is_none() && payload.dry_run.is_none() {
        return Ok(());
    }
    let Some(mut config) = bot.configuration.clone() else {
        return Ok(());
    };
    if let Some(name) = &payload.name {
        let exchange = config
            .extra
            .entry("exchange".to_string())
            .or_insert_with(|| json!({}));
        if let Value::Object(obj) = exchange {
            obj.insert("name".to_string(), json!(name));
        }
    }
    if let Some(dry_run) = payload.dry_run {
        config.dry_run = Some(dry_run);
    }
    controller
        .db()
        .update_bot_configuration(&bot.bot_id, &config)
        .await
}

pub async fn update_strategy(
    State(app): State<App>,
    headers: HeaderMap,
    Query(query): Query<BotQuery>,
    Json(payload): Json<api::UpdateStrategyPayload>,
) -> Response {
    let (controller, bot) = match resolve(&app, &headers, &query.bot_id).await {
        Ok(ok) => ok,
        Err(resp) => return resp,
    };
    match validated::<api::StatusMsg>(
        controller
            .client()
            .update_strategy(&bot.api_url, &payload)
            .await,
    ) {
        Ok(value) => {
            if let Some(strategy) = &payload.strategy {
                if let Err(e) = controller.db().update_bot_strategy(&bot.bot_id, strategy).await
                {
                    return response::error(e);
                }
                if let Some(mut config) = bot.configuration.clone() {
                    config.strategy = Some(strategy.clone());
                    if let Err(e) = controller
                        .db()
                        .update_bot_configuration(&bot.bot_id, &config)
                        .await
                    {
                        return response::error(e);
                    }
                }
            }
            (StatusCode::OK, Json(value)).into_response()
        }
        Err(resp) => resp,
    }
}

pub async fn update_settings(
    State(app): State<App>,
    headers: HeaderMap,
    Query(query): Query<BotQuery>,
    Json(payload): Json<api::UpdateSettingsPayload>,
) -> Response {
    let (controller, bot) = match resolve(&app, &headers, &query.bot_id).await {
        Ok(ok) => ok,
        Err(resp) => return resp,
    };
    match validated::<api::StatusMsg>(
        controller
            .client()
            .update_settings(&bot.api_url, &payload)
            .await,
    ) {
        Ok(value) => {
            if let Err(e) = apply_settings_update(&controller, &bot, &payload).await {
                return response::error(e);
            }
            (StatusCode::OK, Json(value)).into_response()
        }
        Err(resp) => resp,
    }
}

async fn apply_settings_update(
    controller: &crate::controller::Controller,
    bot: &BotRecord,
    payload: &api::UpdateSettingsPayload,
) -> Result<(), Error> {
    if payload.bot_name.is_some() || payload.stake_currency.is_some() {
        controller
            .db()
            .update_bot_settings(
                &bot.bot_id,
                payload.bot_name.as_deref(),
                payload.stake_currency.as_deref(),
            )
            .await?;
    }
    let Some(mut config) = bot.configuration.clone() else {
        return Ok(());
    };
    let mut changed = false;
    if let Some(bot_name) = &payload.bot_name {
        config.bot_name = Some(bot_name.clone());
        changed = true;
    }
    if let Some(stake_currency) = &payload.stake_currency {
        config.stake_currency = Some(stake_currency.clone());
        changed = true;
    }
    if let Some(max_open_trades) = payload.max_open_trades {
        config.max_open_trades = Some(if max_open_trades < 0 {
            MaxOpenTrades::Unlimited
        } else {
            MaxOpenTrades::Limited(max_open_trades)
        });
        changed = true;
    }
    if changed {
        controller
            .db()
            .update_bot_configuration(&bot.bot_id, &config)
            .await?;
    }
    Ok(())
}

pub async fn reset_original_config(
    State(app): State<App>,
    headers: HeaderMap,
    Query(query): Query<BotQuery>,
) -> Response {
    let (controller, bot) = match resolve(&app, &headers, &query.bot_id).await {
        Ok(ok) => ok,
        Err(resp) => return resp,
    };
    respond::<api::StatusMsg>(controller.client().reset_original_config(&bot.api_url).await)
}

#[derive(Deserialize)]
pub struct TimeunitQuery {
    #[serde(rename = "botId", alias = "botid")]
    bot_id: String,

    timeunit: String,

    #[serde(default = "default_timescale")]
    timescale: i64,
}

fn default_timescale() -> i64 {
    1
}

pub async fn timeunit_profit(
    State(app): State<App>,
    headers: HeaderMap,
    Query(query): Query<TimeunitQuery>,
) -> Response {
    let (controller, bot) = match resolve(&app, &headers, &query.bot_id).await {
        Ok(ok) => ok,
        Err(resp) => return resp,
    };
    respond::<api::TimeUnitProfit>(
        controller
            .client()
            .timeunit_profit(&bot.api_url, &query.timeunit, query.timescale)
            .await,
    )
}

/// Fan-out: one-unit windows of the daily, weekly and monthly profit.
pub async fn summary(
    State(app): State<App>,
    headers: HeaderMap,
    Query(query): Query<BotQuery>,
) -> Response {
    let (controller, bot) = match resolve(&app, &headers, &query.bot_id).await {
        Ok(ok) => ok,
        Err(resp) => return resp,
    };
    let mut out = serde_json::Map::new();
    for (unit, timeframe) in [("days", "daily"), ("weeks", "weekly"), ("months", "monthly")] {
        match validated::<api::TimeUnitProfit>(
            controller
                .client()
                .timeunit_profit(&bot.api_url, unit, 1)
                .await,
        ) {
            Ok(value) => {
                out.insert(timeframe.to_string(), value);
            }
            Err(resp) => return resp,
        }
    }
    (StatusCode::OK, Json(Value::Object(out))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_values_decodes_repeated_keys() {
        let query = "botId=coingro01&pairs_to_delete=BNB%2FBTC&pairs_to_delete=ETH%2FUSDT&x=1";
        assert_eq!(query_values(query, "botId"), vec!["coingro01"]);
        assert_eq!(
            query_values(query, "pairs_to_delete"),
            vec!["BNB/BTC", "ETH/USDT"]
        );
        assert!(query_values(query, "missing").is_empty());
    }

    #[test]
    fn validation_passes_raw_payload_through() {
        let value = json!({"status": "bot started", "extra": 1});
        let result = validated::<api::StatusMsg>(Ok(value.clone()));
        assert_eq!(result.unwrap(), value);
    }

    #[test]
    fn error_bodies_reject_with_detail() {
        let result = validated::<api::StatusMsg>(Ok(json!({"detail": "already running"})));
        let resp = result.unwrap_err();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn transport_errors_become_bad_gateway() {
        let result = validated::<api::StatusMsg>(Err(Error::transient("connection refused")));
        let resp = result.unwrap_err();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    }
}
