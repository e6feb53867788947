use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub display_name: String,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub website_url: Option<String>,
    pub github_username: Option<String>,
    /// External identity-provider id this account is bound to.
    pub identity_id: String,
    /// Billing-provider customer id, set on first checkout.
    pub billing_customer_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateUser {
    pub username: String,
    pub display_name: String,
    pub identity_id: String,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct UpdateProfile {
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub website_url: Option<String>,
    pub github_username: Option<String>,
}

const USER_COLUMNS: &str = "id, username, display_name, bio, avatar_url, website_url, \
     github_username, identity_id, billing_customer_id, created_at, updated_at";

impl User {
    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_by_username(
        pool: &SqlitePool,
        username: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_by_identity_id(
        pool: &SqlitePool,
        identity_id: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE identity_id = $1"
        ))
        .bind(identity_id)
        .fetch_optional(pool)
        .await
    }

    /// Register a local account for an external identity. Re-registering the
    /// same identity returns the existing row unchanged.
    pub async fn create(pool: &SqlitePool, data: &CreateUser) -> Result<Self, sqlx::Error> {
        if let Some(existing) = Self::find_by_identity_id(pool, &data.identity_id).await? {
            return Ok(existing);
        }

        let id = Uuid::new_v4();
        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (id, username, display_name, identity_id, avatar_url)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(&data.username)
        .bind(&data.display_name)
        .bind(&data.identity_id)
        .bind(&data.avatar_url)
        .fetch_one(pool)
        .await
    }

    /// Partial profile update; unset fields keep their current value.
    pub async fn update_profile(
        pool: &SqlitePool,
        id: Uuid,
        data: &UpdateProfile,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "UPDATE users
             SET display_name = COALESCE($2, display_name),
                 bio = COALESCE($3, bio),
                 avatar_url = COALESCE($4, avatar_url),
                 website_url = COALESCE($5, website_url),
                 github_username = COALESCE($6, github_username),
                 updated_at = CURRENT_TIMESTAMP
             WHERE id = $1
             RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(&data.display_name)
        .bind(&data.bio)
        .bind(&data.avatar_url)
        .bind(&data.website_url)
        .bind(&data.github_username)
        .fetch_one(pool)
        .await
    }

    pub async fn set_billing_customer_id(
        pool: &SqlitePool,
        id: Uuid,
        customer_id: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE users SET billing_customer_id = $2, updated_at = CURRENT_TIMESTAMP WHERE id = $1",
        )
        .bind(id)
        .bind(customer_id)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn list(
        pool: &SqlitePool,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC LIMIT $1 OFFSET $2"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
    }

    pub async fn count(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(pool)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DBService;

    fn sample(username: &str, identity_id: &str) -> CreateUser {
        CreateUser {
            username: username.to_string(),
            display_name: username.to_string(),
            identity_id: identity_id.to_string(),
            avatar_url: None,
        }
    }

    #[tokio::test]
    async fn create_and_find_roundtrip() {
        let db = DBService::new_in_memory().await.unwrap();
        let created = User::create(&db.pool, &sample("ada", "idp_1")).await.unwrap();

        let by_id = User::find_by_id(&db.pool, created.id).await.unwrap().unwrap();
        assert_eq!(by_id.username, "ada");

        let by_name = User::find_by_username(&db.pool, "ada").await.unwrap().unwrap();
        assert_eq!(by_name.id, created.id);
    }

    #[tokio::test]
    async fn create_is_idempotent_per_identity() {
        let db = DBService::new_in_memory().await.unwrap();
        let first = User::create(&db.pool, &sample("ada", "idp_1")).await.unwrap();
        let second = User::create(&db.pool, &sample("other", "idp_1")).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.username, "ada");
    }

    #[tokio::test]
    async fn update_profile_keeps_unset_fields() {
        let db = DBService::new_in_memory().await.unwrap();
        let user = User::create(&db.pool, &sample("ada", "idp_1")).await.unwrap();

        let updated = User::update_profile(
            &db.pool,
            user.id,
            &UpdateProfile {
                display_name: None,
                bio: Some("building".to_string()),
                avatar_url: None,
                website_url: Some("https://ada.dev".to_string()),
                github_username: None,
            },
        )
        .await
        .unwrap();

        assert_eq!(updated.display_name, "ada");
        assert_eq!(updated.bio.as_deref(), Some("building"));
        assert_eq!(updated.website_url.as_deref(), Some("https://ada.dev"));
    }
}
