use super::{
    super::state::AppState, backend_failure, cham_api_err, cham_api_response,
};
use axum::{
    body::Body,
    extract::{Query, State},
    http::{Response, StatusCode},
};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Default, Deserialize)]
pub struct ApproveQuery {
    pub token: Option<String>,
    pub payment_id: Option<String>,
    pub membership_id: Option<String>,
}

#[derive(Serialize)]
struct ApproveResponse {
    ok: bool,
    membership_id: String,
    payment_id: String,
}

/// Link mailed to the board to approve a membership payment.
pub fn approval_link(site_url: &str, token: &str, payment_id: &str, membership_id: &str) -> String {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("token", token)
        .append_pair("payment_id", payment_id)
        .append_pair("membership_id", membership_id)
        .finish();
    format!("{site_url}/api/admin/payments/approve?{query}")
}

fn present(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// GET /api/admin/payments/approve
pub async fn get_admin_approve_payment(
    State(state): State<AppState>,
    Query(query): Query<ApproveQuery>,
) -> Response<Body> {
    let (Some(payment_id), Some(membership_id)) =
        (present(query.payment_id), present(query.membership_id))
    else {
        return cham_api_err(StatusCode::BAD_REQUEST, "Missing ids");
    };

    if !state.settings.admin_token_matches(query.token.as_deref()) {
        warn!("rejected approval of payment {payment_id}: bad token");
        return cham_api_err(StatusCode::UNAUTHORIZED, "Unauthorized");
    }

    if let Err(e) = state.backend.mark_payment_succeeded(&payment_id).await {
        return backend_failure("Failed to approve payment", &e);
    }

    let started_at = Utc::now();
    let expires_at = started_at + Duration::days(state.settings.membership.duration_days);
    if let Err(e) = state
        .backend
        .activate_membership(&membership_id, started_at, expires_at)
        .await
    {
        return backend_failure("Failed to activate membership", &e);
    }

    info!("payment {payment_id} approved, membership {membership_id} active until {expires_at}");
    cham_api_response(
        StatusCode::OK,
        ApproveResponse {
            ok: true,
            membership_id,
            payment_id,
        },
    )
}
