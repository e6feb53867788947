use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

#[derive(
    Debug, Clone, Type, Serialize, Deserialize, PartialEq, TS, EnumString, Display, Default,
)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SponsorshipStatus {
    /// Checkout session created, payment not yet confirmed.
    #[default]
    Pending,
    Active,
    Canceled,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Sponsorship {
    pub id: Uuid,
    pub sponsor_id: Uuid,
    pub recipient_id: Uuid,
    pub amount_cents: i64,
    pub currency: String,
    /// Billing-provider checkout session this sponsorship was created from.
    pub checkout_session_id: Option<String>,
    pub status: SponsorshipStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Read model for a profile's sponsor list.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct SponsorshipWithSponsor {
    #[sqlx(flatten)]
    #[serde(flatten)]
    #[ts(flatten)]
    pub sponsorship: Sponsorship,
    pub sponsor_username: String,
    pub sponsor_display_name: String,
    pub sponsor_avatar_url: Option<String>,
}

impl std::ops::Deref for SponsorshipWithSponsor {
    type Target = Sponsorship;
    fn deref(&self) -> &Self::Target {
        &self.sponsorship
    }
}

const SPONSORSHIP_COLUMNS: &str = "id, sponsor_id, recipient_id, amount_cents, currency, \
     checkout_session_id, status, created_at, updated_at";

impl Sponsorship {
    pub async fn create_pending(
        pool: &SqlitePool,
        sponsor_id: Uuid,
        recipient_id: Uuid,
        amount_cents: i64,
        currency: &str,
        checkout_session_id: &str,
    ) -> Result<Self, sqlx::Error> {
        let id = Uuid::new_v4();
        sqlx::query_as::<_, Sponsorship>(&format!(
            "INSERT INTO sponsorships (id, sponsor_id, recipient_id, amount_cents, currency, checkout_session_id, status)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {SPONSORSHIP_COLUMNS}"
        ))
        .bind(id)
        .bind(sponsor_id)
        .bind(recipient_id)
        .bind(amount_cents)
        .bind(currency)
        .bind(checkout_session_id)
        .bind(SponsorshipStatus::Pending)
        .fetch_one(pool)
        .await
    }

    /// Flip the sponsorship for a completed checkout session to active.
    /// Returns `None` when no pending sponsorship matches the session (for
    /// example a replayed or foreign webhook).
    pub async fn activate_by_checkout_session(
        pool: &SqlitePool,
        checkout_session_id: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Sponsorship>(&format!(
            "UPDATE sponsorships
             SET status = $2, updated_at = CURRENT_TIMESTAMP
             WHERE checkout_session_id = $1 AND status = $3
             RETURNING {SPONSORSHIP_COLUMNS}"
        ))
        .bind(checkout_session_id)
        .bind(SponsorshipStatus::Active)
        .bind(SponsorshipStatus::Pending)
        .fetch_optional(pool)
        .await
    }

    pub async fn cancel(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Sponsorship>(&format!(
            "UPDATE sponsorships
             SET status = $2, updated_at = CURRENT_TIMESTAMP
             WHERE id = $1
             RETURNING {SPONSORSHIP_COLUMNS}"
        ))
        .bind(id)
        .bind(SponsorshipStatus::Canceled)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_active_by_recipient(
        pool: &SqlitePool,
        recipient_id: Uuid,
    ) -> Result<Vec<SponsorshipWithSponsor>, sqlx::Error> {
        sqlx::query_as::<_, SponsorshipWithSponsor>(
            "SELECT
                s.id, s.sponsor_id, s.recipient_id, s.amount_cents, s.currency,
                s.checkout_session_id, s.status, s.created_at, s.updated_at,
                u.username AS sponsor_username,
                u.display_name AS sponsor_display_name,
                u.avatar_url AS sponsor_avatar_url
             FROM sponsorships s
             JOIN users u ON u.id = s.sponsor_id
             WHERE s.recipient_id = $1 AND s.status = $2
             ORDER BY s.created_at DESC",
        )
        .bind(recipient_id)
        .bind(SponsorshipStatus::Active)
        .fetch_all(pool)
        .await
    }
}
