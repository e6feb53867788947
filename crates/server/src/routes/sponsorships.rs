//! Routes for the sponsorship flow: checkout, the billing portal, sponsor
//! listings, and the billing webhook.

use axum::{
    Router,
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::models::{
    sponsorship::{Sponsorship, SponsorshipWithSponsor},
    user::User,
};
use serde::{Deserialize, Serialize};
use services::services::billing::{BillingEvent, CheckoutParams, parse_webhook_event};
use tracing::{info, warn};
use ts_rs::TS;
use utils::response::ApiResponse;

use crate::{AppState, auth::CurrentUser, error::ApiError};

const WEBHOOK_SECRET_HEADER: &str = "x-webhook-secret";
const MIN_AMOUNT_CENTS: i64 = 100;
const MAX_AMOUNT_CENTS: i64 = 1_000_000;

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CheckoutRequest {
    pub recipient_username: String,
    pub amount_cents: i64,
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CheckoutResponse {
    pub checkout_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct PortalResponse {
    pub portal_url: String,
}

/// Start a sponsorship: create a hosted checkout session and a pending
/// sponsorship row keyed by it. The webhook flips it to active on payment.
pub async fn create_checkout(
    State(state): State<AppState>,
    current: CurrentUser,
    axum::Json(payload): axum::Json<CheckoutRequest>,
) -> Result<ResponseJson<ApiResponse<CheckoutResponse>>, ApiError> {
    if !(MIN_AMOUNT_CENTS..=MAX_AMOUNT_CENTS).contains(&payload.amount_cents) {
        return Err(ApiError::BadRequest(format!(
            "amount must be between {MIN_AMOUNT_CENTS} and {MAX_AMOUNT_CENTS} cents"
        )));
    }

    let recipient = User::find_by_username(&state.db().pool, &payload.recipient_username)
        .await?
        .ok_or(ApiError::NotFound("user"))?;
    if recipient.id == current.user.id {
        return Err(ApiError::BadRequest(
            "cannot sponsor yourself".to_string(),
        ));
    }

    let currency = payload.currency.unwrap_or_else(|| "usd".to_string());
    let base = &state.config().app_base_url;
    let session = state
        .billing()
        .create_checkout_session(&CheckoutParams {
            customer_id: current.user.billing_customer_id.clone(),
            amount_cents: payload.amount_cents,
            currency: currency.clone(),
            product_name: format!("Sponsor @{}", recipient.username),
            success_url: format!("{base}/{}?sponsored=1", recipient.username),
            cancel_url: format!("{base}/{}", recipient.username),
        })
        .await?;

    if current.user.billing_customer_id.is_none() {
        if let Some(customer_id) = &session.customer_id {
            User::set_billing_customer_id(&state.db().pool, current.user.id, customer_id).await?;
        }
    }

    Sponsorship::create_pending(
        &state.db().pool,
        current.user.id,
        recipient.id,
        payload.amount_cents,
        &currency,
        &session.id,
    )
    .await?;

    info!(
        sponsor = %current.user.username,
        recipient = %recipient.username,
        session_id = %session.id,
        "checkout session created"
    );

    Ok(ResponseJson(ApiResponse::success(CheckoutResponse {
        checkout_url: session.url,
    })))
}

/// Open the billing portal for the caller's existing sponsorships.
pub async fn create_portal(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<ResponseJson<ApiResponse<PortalResponse>>, ApiError> {
    let customer_id = current.user.billing_customer_id.as_deref().ok_or_else(|| {
        ApiError::BadRequest("no billing history for this account".to_string())
    })?;

    let return_url = format!("{}/settings", state.config().app_base_url);
    let session = state
        .billing()
        .create_portal_session(customer_id, &return_url)
        .await?;

    Ok(ResponseJson(ApiResponse::success(PortalResponse {
        portal_url: session.url,
    })))
}

/// Active sponsors of a user, as the profile sidebar renders them.
pub async fn list_sponsors(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<ResponseJson<ApiResponse<Vec<SponsorshipWithSponsor>>>, ApiError> {
    let user = User::find_by_username(&state.db().pool, &username)
        .await?
        .ok_or(ApiError::NotFound("user"))?;
    let sponsors = Sponsorship::find_active_by_recipient(&state.db().pool, user.id).await?;
    Ok(ResponseJson(ApiResponse::success(sponsors)))
}

/// Billing-provider webhook. Gated by a shared-secret header; the payload is
/// narrowed as untrusted input. Unknown events are acknowledged so the
/// provider stops retrying them.
pub async fn billing_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let provided = headers
        .get(WEBHOOK_SECRET_HEADER)
        .and_then(|value| value.to_str().ok());
    state.billing().verify_webhook_secret(provided)?;

    match parse_webhook_event(&body)? {
        BillingEvent::CheckoutCompleted {
            session_id,
            customer_id,
        } => {
            match Sponsorship::activate_by_checkout_session(&state.db().pool, &session_id).await? {
                Some(sponsorship) => {
                    if let Some(customer_id) = customer_id {
                        let sponsor =
                            User::find_by_id(&state.db().pool, sponsorship.sponsor_id).await?;
                        if let Some(sponsor) = sponsor.filter(|s| s.billing_customer_id.is_none())
                        {
                            User::set_billing_customer_id(
                                &state.db().pool,
                                sponsor.id,
                                &customer_id,
                            )
                            .await?;
                        }
                    }
                    info!(session_id = %session_id, "sponsorship activated");
                }
                None => {
                    // Replayed delivery or a session we never created.
                    warn!(session_id = %session_id, "checkout completion matched no pending sponsorship");
                }
            }
        }
        BillingEvent::Ignored { event_type } => {
            info!(event_type = %event_type, "ignoring billing event");
        }
    }

    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/sponsorships/checkout", post(create_checkout))
        .route("/sponsorships/portal", post(create_portal))
        .route("/users/{username}/sponsors", get(list_sponsors))
        .route("/webhooks/billing", post(billing_webhook))
}
