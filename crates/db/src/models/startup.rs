use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Startup {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub tagline: String,
    pub description: Option<String>,
    pub website_url: Option<String>,
    /// `owner/name` slug of the public repository, if the startup links one.
    pub github_repo: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateStartup {
    pub name: String,
    pub tagline: String,
    pub description: Option<String>,
    pub website_url: Option<String>,
    pub github_repo: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct UpdateStartup {
    pub name: Option<String>,
    pub tagline: Option<String>,
    pub description: Option<String>,
    pub website_url: Option<String>,
    pub github_repo: Option<String>,
}

const STARTUP_COLUMNS: &str =
    "id, owner_id, name, tagline, description, website_url, github_repo, created_at, updated_at";

impl Startup {
    pub async fn create(
        pool: &SqlitePool,
        owner_id: Uuid,
        data: &CreateStartup,
    ) -> Result<Self, sqlx::Error> {
        let id = Uuid::new_v4();
        sqlx::query_as::<_, Startup>(&format!(
            "INSERT INTO startups (id, owner_id, name, tagline, description, website_url, github_repo)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {STARTUP_COLUMNS}"
        ))
        .bind(id)
        .bind(owner_id)
        .bind(&data.name)
        .bind(&data.tagline)
        .bind(&data.description)
        .bind(&data.website_url)
        .bind(&data.github_repo)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Startup>(&format!(
            "SELECT {STARTUP_COLUMNS} FROM startups WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn update(
        pool: &SqlitePool,
        id: Uuid,
        data: &UpdateStartup,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Startup>(&format!(
            "UPDATE startups
             SET name = COALESCE($2, name),
                 tagline = COALESCE($3, tagline),
                 description = COALESCE($4, description),
                 website_url = COALESCE($5, website_url),
                 github_repo = COALESCE($6, github_repo),
                 updated_at = CURRENT_TIMESTAMP
             WHERE id = $1
             RETURNING {STARTUP_COLUMNS}"
        ))
        .bind(id)
        .bind(&data.name)
        .bind(&data.tagline)
        .bind(&data.description)
        .bind(&data.website_url)
        .bind(&data.github_repo)
        .fetch_one(pool)
        .await
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM startups WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn list(
        pool: &SqlitePool,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Startup>(&format!(
            "SELECT {STARTUP_COLUMNS} FROM startups ORDER BY created_at DESC LIMIT $1 OFFSET $2"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_owner_id(
        pool: &SqlitePool,
        owner_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Startup>(&format!(
            "SELECT {STARTUP_COLUMNS} FROM startups WHERE owner_id = $1 ORDER BY created_at DESC"
        ))
        .bind(owner_id)
        .fetch_all(pool)
        .await
    }

    pub async fn count(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM startups")
            .fetch_one(pool)
            .await
    }
}
