use axum::{http::HeaderMap, response::Response};
use coingro_common::response;
use coingro_types::Role;
use serde::Deserialize;

use crate::persistence::{BotRecord, Database, UserRecord};

/// Bot binding carried on every proxied request.
#[derive(Deserialize, Debug, Clone)]
pub struct BotQuery {
    #[serde(rename = "botId", alias = "botid")]
    pub bot_id: String,
}

/// Authentication happens upstream; the trusted `userid` header names the
/// caller. Missing or unknown users read as 404.
pub async fn get_user(db: &Database, headers: &HeaderMap) -> Result<UserRecord, Response> {
    let user_id = headers
        .get("userid")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<i64>().ok());
    let Some(user_id) = user_id else {
        return Err(response::not_found(anyhow::anyhow!("User not found.")));
    };
    match db.user_by_id(user_id).await {
        Ok(Some(user)) if user.deleted_at.is_none() => Ok(user),
        Ok(_) => Err(response::not_found(anyhow::anyhow!("User not found."))),
        Err(e) => Err(response::error(e)),
    }
}

/// Resolves the target bot and authorizes it against the caller: plain
/// users may only touch their own bots, tombstoned bots do not exist.
pub async fn get_bot(
    db: &Database,
    headers: &HeaderMap,
    bot_id: &str,
) -> Result<BotRecord, Response> {
    let user = get_user(db, headers).await?;
    let bot = match db.bot_by_id(bot_id).await {
        Ok(Some(bot)) if !bot.is_deleted() => bot,
        Ok(_) => return Err(response::not_found(anyhow::anyhow!("Bot not found."))),
        Err(e) => return Err(response::error(e)),
    };
    if user.role == Role::User && bot.user_id != Some(user.id) {
        return Err(response::unauthorized(anyhow::anyhow!("Unauthorized.")));
    }
    Ok(bot)
}
