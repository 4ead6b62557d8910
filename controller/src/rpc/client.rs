use coingro_common::retry::{DEFAULT_BACKOFF, DEFAULT_RETRIES, retry};
use coingro_types::api::{
    BlacklistPayload, DeleteLockRequest, ForceEnterPayload, ForceExitPayload,
    UpdateExchangePayload, UpdateSettingsPayload, UpdateStrategyPayload,
};
use reqwest::Method;
use serde_json::Value;

use crate::{config::Config, error::Error};

/// HTTP client speaking a single bot's REST API, addressed by the bot's
/// `api_url`. Transport errors are retried with bounded backoff; HTTP error
/// bodies are returned as values so callers can surface the bot's own
/// `detail` payloads.
#[derive(Clone)]
pub struct CoingroClient {
    client: reqwest::Client,
    credentials: Option<(String, String)>,
}

impl CoingroClient {
    pub fn new(config: &Config) -> Self {
        let credentials = match (
            &config.cg_api_server_username,
            &config.cg_api_server_password,
        ) {
            (Some(username), Some(password)) => Some((username.clone(), password.clone())),
            _ => None,
        };
        Self {
            client: reqwest::Client::new(),
            credentials,
        }
    }

    async fn call(
        &self,
        method: Method,
        server_url: &str,
        api_path: &str,
        params: &[(&str, String)],
        data: Option<&Value>,
    ) -> Result<Value, Error> {
        let url = format!("{}/{}", server_url.trim_end_matches('/'), api_path);
        let url = url.as_str();
        let method = &method;
        retry(DEFAULT_RETRIES, DEFAULT_BACKOFF, move || async move {
            let mut req = self
                .client
                .request(method.clone(), url)
                .header(reqwest::header::ACCEPT, "application/json");
            if let Some((username, password)) = &self.credentials {
                req = req.basic_auth(username, Some(password));
            }
            if !params.is_empty() {
                req = req.query(params);
            }
            if let Some(data) = data {
                req = req.json(data);
            }
            let resp = req
                .send()
                .await
                .map_err(|e| Error::transient(format!("error connecting to {}: {}", url, e)))?;
            resp.json::<Value>()
                .await
                .map_err(|e| Error::transient(format!("invalid response from {}: {}", url, e)))
        })
        .await
    }

    async fn get(
        &self,
        server_url: &str,
        api_path: &str,
        params: &[(&str, String)],
    ) -> Result<Value, Error> {
        self.call(Method::GET, server_url, api_path, params, None)
            .await
    }

    async fn post(
        &self,
        server_url: &str,
        api_path: &str,
        data: Option<&Value>,
    ) -> Result<Value, Error> {
        self.call(Method::POST, server_url, api_path, &[], data)
            .await
    }

    async fn delete(
        &self,
        server_url: &str,
        api_path: &str,
        params: &[(&str, String)],
    ) -> Result<Value, Error> {
        self.call(Method::DELETE, server_url, api_path, params, None)
            .await
    }

    pub async fn ping(&self, server_url: &str) -> Result<Value, Error> {
        self.get(server_url, "ping", &[]).await
    }

    pub async fn version(&self, server_url: &str) -> Result<Value, Error> {
        self.get(server_url, "version", &[]).await
    }

    pub async fn balance(&self, server_url: &str) -> Result<Value, Error> {
        self.get(server_url, "balance", &[]).await
    }

    pub async fn count(&self, server_url: &str) -> Result<Value, Error> {
        self.get(server_url, "count", &[]).await
    }

    pub async fn performance(&self, server_url: &str) -> Result<Value, Error> {
        self.get(server_url, "performance", &[]).await
    }

    pub async fn profit(&self, server_url: &str) -> Result<Value, Error> {
        self.get(server_url, "profit", &[]).await
    }

    pub async fn stats(&self, server_url: &str) -> Result<Value, Error> {
        self.get(server_url, "stats", &[]).await
    }

    pub async fn daily(&self, server_url: &str, days: Option<i64>) -> Result<Value, Error> {
        let params: Vec<(&str, String)> = days
            .map(|days| vec![("timescale", days.to_string())])
            .unwrap_or_default();
        self.get(server_url, "daily", &params).await
    }

    pub async fn status(&self, server_url: &str) -> Result<Value, Error> {
        self.get(server_url, "status", &[]).await
    }

    pub async fn trades(
        &self,
        server_url: &str,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Value, Error> {
        let mut params = Vec::new();
        if let Some(limit) = limit {
            params.push(("limit", limit.to_string()));
        }
        if let Some(offset) = offset {
            params.push(("offset", offset.to_string()));
        }
        self.get(server_url, "trades", &params).await
    }

    pub async fn trade(&self, server_url: &str, trade_id: i64) -> Result<Value, Error> {
        self.get(server_url, &format!("trade/{}", trade_id), &[])
            .await
    }

    pub async fn delete_trade(&self, server_url: &str, trade_id: i64) -> Result<Value, Error> {
        self.delete(server_url, &format!("trades/{}", trade_id), &[])
            .await
    }

    pub async fn show_config(&self, server_url: &str) -> Result<Value, Error> {
        self.get(server_url, "show_config", &[]).await
    }

    pub async fn forceenter(
        &self,
        server_url: &str,
        payload: &ForceEnterPayload,
    ) -> Result<Value, Error> {
        self.post(server_url, "forceenter", Some(&serde_json::to_value(payload)?))
            .await
    }

    pub async fn forceexit(
        &self,
        server_url: &str,
        payload: &ForceExitPayload,
    ) -> Result<Value, Error> {
        self.post(server_url, "forceexit", Some(&serde_json::to_value(payload)?))
            .await
    }

    pub async fn blacklist(&self, server_url: &str) -> Result<Value, Error> {
        self.get(server_url, "blacklist", &[]).await
    }

    pub async fn add_blacklist(
        &self,
        server_url: &str,
        payload: &BlacklistPayload,
    ) -> Result<Value, Error> {
        self.post(server_url, "blacklist", Some(&serde_json::to_value(payload)?))
            .await
    }

    pub async fn delete_blacklist(
        &self,
        server_url: &str,
        pairs_to_delete: &[String],
    ) -> Result<Value, Error> {
        let params: Vec<(&str, String)> = pairs_to_delete
            .iter()
            .map(|pair| ("pairs_to_delete", pair.clone()))
            .collect();
        self.delete(server_url, "blacklist", &params).await
    }

    pub async fn whitelist(&self, server_url: &str) -> Result<Value, Error> {
        self.get(server_url, "whitelist", &[]).await
    }

    pub async fn locks(&self, server_url: &str) -> Result<Value, Error> {
        self.get(server_url, "locks", &[]).await
    }

    pub async fn delete_lock(&self, server_url: &str, lock_id: i64) -> Result<Value, Error> {
        self.delete(server_url, &format!("locks/{}", lock_id), &[])
            .await
    }

    pub async fn delete_lock_pair(
        &self,
        server_url: &str,
        payload: &DeleteLockRequest,
    ) -> Result<Value, Error> {
        self.post(
            server_url,
            "locks/delete",
            Some(&serde_json::to_value(payload)?),
        )
        .await
    }

    pub async fn logs(&self, server_url: &str, limit: Option<i64>) -> Result<Value, Error> {
        let params: Vec<(&str, String)> = limit
            .map(|limit| vec![("limit", limit.to_string())])
            .unwrap_or_default();
        self.get(server_url, "logs", &params).await
    }

    pub async fn start(&self, server_url: &str) -> Result<Value, Error> {
        self.post(server_url, "start", None).await
    }

    pub async fn stop(&self, server_url: &str) -> Result<Value, Error> {
        self.post(server_url, "stop", None).await
    }

    pub async fn stopbuy(&self, server_url: &str) -> Result<Value, Error> {
        self.post(server_url, "stopbuy", None).await
    }

    pub async fn reload_config(&self, server_url: &str) -> Result<Value, Error> {
        self.post(server_url, "reload_config", None).await
    }

    pub async fn sysinfo(&self, server_url: &str) -> Result<Value, Error> {
        self.get(server_url, "sysinfo", &[]).await
    }

    pub async fn health(&self, server_url: &str) -> Result<Value, Error> {
        self.get(server_url, "health", &[]).await
    }

    pub async fn state(&self, server_url: &str) -> Result<Value, Error> {
        self.get(server_url, "state", &[]).await
    }

    pub async fn update_exchange(
        &self,
        server_url: &str,
        payload: &UpdateExchangePayload,
    ) -> Result<Value, Error> {
        self.post(server_url, "exchange", Some(&serde_json::to_value(payload)?))
            .await
    }

    pub async fn update_strategy(
        &self,
        server_url: &str,
        payload: &UpdateStrategyPayload,
    ) -> Result<Value, Error> {
        self.post(server_url, "strategy", Some(&serde_json::to_value(payload)?))
            .await
    }

    pub async fn update_settings(
        &self,
        server_url: &str,
        payload: &UpdateSettingsPayload,
    ) -> Result<Value, Error> {
        self.post(server_url, "settings", Some(&serde_json::to_value(payload)?))
            .await
    }

    pub async fn reset_original_config(&self, server_url: &str) -> Result<Value, Error> {
        self.post(server_url, "reset_original_config", None).await
    }

    pub async fn timeunit_profit(
        &self,
        server_url: &str,
        timeunit: &str,
        timescale: i64,
    ) -> Result<Value, Error> {
        let timeunit = match timeunit {
            "weeks" | "months" => timeunit,
            _ => "days",
        };
        self.get(
            server_url,
            "timeunit_profit",
            &[
                ("timeunit", timeunit.to_string()),
                ("timescale", timescale.to_string()),
            ],
        )
        .await
    }

    pub async fn trade_summary(&self, server_url: &str) -> Result<Value, Error> {
        self.get(server_url, "trade_summary", &[]).await
    }
}
