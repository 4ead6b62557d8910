use std::{net::SocketAddr, ops::Deref, sync::Arc};

use anyhow::{Context, Result};
use axum::{
    Router, middleware,
    routing::{delete, get, post},
};
use coingro_common::{access_log, cors};
use owo_colors::OwoColorize;
use tokio_util::sync::CancellationToken;

use crate::{
    config::ApiServerConfig,
    controller::{Controller, SharedController},
};

mod api_v1;
mod deps;

pub struct AppInner {
    pub controller: SharedController,
}

/// Shared state of the aggregation server. Handlers read the reconciler
/// through the shared handle so a RELOAD_CONFIG swap is picked up
/// transparently.
#[derive(Clone)]
pub struct App {
    inner: Arc<AppInner>,
}

impl Deref for App {
    type Target = AppInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl App {
    pub fn new(controller: SharedController) -> Self {
        Self {
            inner: Arc::new(AppInner { controller }),
        }
    }

    pub async fn controller(&self) -> Controller {
        self.controller.read().await.clone()
    }
}

pub fn router(app_state: App) -> Router {
    Router::new()
        // Controller-local endpoints.
        .route("/api/v1/ping", get(api_v1::ping))
        .route("/api/v1/controller_version", get(api_v1::controller_version))
        .route("/api/v1/controller_sysinfo", get(api_v1::controller_sysinfo))
        .route("/api/v1/controller_health", get(api_v1::controller_health))
        .route("/api/v1/strategies", get(api_v1::list_strategies))
        .route("/api/v1/strategy/{strategy}", get(api_v1::get_strategy))
        .route("/api/v1/settings_options", get(api_v1::settings_options))
        // Bot lifecycle.
        .route("/api/v1/create_bot", post(api_v1::create_bot))
        .route("/api/v1/activate_bot", post(api_v1::activate_bot))
        .route("/api/v1/deactivate_bot", post(api_v1::deactivate_bot))
        .route("/api/v1/delete_bot", post(api_v1::delete_bot))
        // Per-bot proxy.
        .route("/api/v1/version", get(api_v1::version))
        .route("/api/v1/balance", get(api_v1::balance))
        .route("/api/v1/count", get(api_v1::count))
        .route("/api/v1/performance", get(api_v1::performance))
        .route("/api/v1/profit", get(api_v1::profit))
        .route("/api/v1/stats", get(api_v1::stats))
        .route("/api/v1/daily", get(api_v1::daily))
        .route("/api/v1/status", get(api_v1::status))
        .route("/api/v1/trades", get(api_v1::trades))
        .route("/api/v1/trade/{tradeid}", get(api_v1::trade))
        .route("/api/v1/trades/{tradeid}", delete(api_v1::trades_delete))
        .route("/api/v1/show_config", get(api_v1::show_config))
        .route("/api/v1/forceenter", post(api_v1::forceenter))
        .route("/api/v1/forceexit", post(api_v1::forceexit))
        .route(
            "/api/v1/blacklist",
            get(api_v1::blacklist)
                .post(api_v1::blacklist_post)
                .delete(api_v1::blacklist_delete),
        )
        .route("/api/v1/whitelist", get(api_v1::whitelist))
        .route("/api/v1/locks", get(api_v1::locks))
        .route("/api/v1/locks/{lockid}", delete(api_v1::delete_lock))
        .route("/api/v1/locks/delete", post(api_v1::delete_lock_pair))
        .route("/api/v1/logs", get(api_v1::logs))
        .route("/api/v1/start", post(api_v1::start))
        .route("/api/v1/stop", post(api_v1::stop))
        .route("/api/v1/stopbuy", post(api_v1::stop_buy))
        .route("/api/v1/reload_config", post(api_v1::reload_config))
        .route("/api/v1/sysinfo", get(api_v1::sysinfo))
        .route("/api/v1/health", get(api_v1::health))
        .route("/api/v1/state", get(api_v1::state))
        .route("/api/v1/exchange", post(api_v1::update_exchange))
        .route("/api/v1/strategy", post(api_v1::update_strategy))
        .route("/api/v1/settings", post(api_v1::update_settings))
        .route(
            "/api/v1/reset_original_config",
            post(api_v1::reset_original_config),
        )
        .route("/api/v1/timeunit_profit", get(api_v1::timeunit_profit))
        .route("/api/v1/summary", get(api_v1::summary))
        .with_state(app_state)
}

pub async fn run_server(
    cancel: CancellationToken,
    api_config: ApiServerConfig,
    app_state: App,
) -> Result<()> {
    let errors_only = api_config.verbosity.as_deref() != Some("info");
    let router = router(app_state);
    let router = if errors_only {
        router.layer(middleware::from_fn(access_log::public_error_only))
    } else {
        router.layer(middleware::from_fn(access_log::public))
    };
    let router = router.layer(cors::from_origins(&api_config.cors_origins));

    let addr = SocketAddr::new(api_config.listen_ip_address, api_config.listen_port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    println!(
        "{}{}",
        "🚀 Starting HTTP server • ".green(),
        addr.green().dimmed()
    );
    let start = std::time::Instant::now();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            cancel.cancelled().await;
        })
        .await
        .context("Failed to serve api router")?;
    println!(
        "{} {} {}",
        "🛑 HTTP server shut down gracefully".red(),
        "• uptime was".red(),
        humantime::format_duration(start.elapsed()).red().dimmed()
    );
    Ok(())
}
