use chrono::{DateTime, Utc};
use coingro_types::Role;
use sqlx::{Row, any::AnyRow};

use super::{Database, fmt_ts, parse_ts, sql};
use crate::error::Error;

/// A principal owning bots. Authentication happens upstream; the controller
/// only consults the role and ownership for authorization.
#[derive(Clone, Debug)]
pub struct UserRecord {
    pub id: i64,
    pub fullname: String,
    pub email: String,
    pub username: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

fn user_from_row(row: &AnyRow) -> Result<UserRecord, Error> {
    let role: String = row.try_get("role")?;
    let created_at: String = row.try_get("created_at")?;
    Ok(UserRecord {
        id: row.try_get("id")?,
        fullname: row.try_get("fullname")?,
        email: row.try_get("email")?,
        username: row.try_get("username")?,
        role: role
            .parse::<Role>()
            .map_err(|e| Error::operational(format!("Invalid role: {}", e)))?,
        created_at: parse_ts(Some(created_at))?
            .ok_or_else(|| Error::operational("Missing created_at"))?,
        deleted_at: parse_ts(row.try_get("deleted_at")?)?,
    })
}

impl Database {
    pub async fn user_by_id(&self, user_id: i64) -> Result<Option<UserRecord>, Error> {
        let row = sqlx::query(sql::USER_BY_ID)
            .bind(user_id)
            .fetch_optional(self.pool())
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    pub async fn insert_user(
        &self,
        fullname: &str,
        email: &str,
        username: &str,
        role: Role,
        password_hash: &str,
    ) -> Result<i64, Error> {
        let row = sqlx::query(sql::INSERT_USER)
            .bind(fullname)
            .bind(email)
            .bind(username)
            .bind(role.as_str())
            .bind(password_hash)
            .bind(fmt_ts(Utc::now()))
            .fetch_one(self.pool())
            .await?;
        Ok(row.try_get::<i64, _>(0)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn user_round_trip() {
        let db = Database::connect("sqlite://").await.unwrap();
        let id = db
            .insert_user("Ada Lovelace", "ada@example.com", "ada", Role::Admin, "x")
            .await
            .unwrap();
        let user = db.user_by_id(id).await.unwrap().unwrap();
        assert_eq!(user.username, "ada");
        assert_eq!(user.role, Role::Admin);
        assert!(db.user_by_id(id + 1).await.unwrap().is_none());
    }
}
