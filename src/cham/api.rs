use super::{ChamResult, backend::BackendError};

use axum::{
    Json,
    body::{Body, Bytes},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Serialize, de::DeserializeOwned};
use std::fmt::Display;
#[allow(unused_imports)]
use tracing::{debug, error, info};

pub mod admin;
pub mod auth;
pub mod events;
pub mod membership;
pub mod public;

pub use admin::get_admin_approve_payment;
pub use auth::{post_login, post_logout, post_magic_link, post_session};
pub use events::post_event_register;
pub use membership::post_membership_submit;
pub use public::{
    get_countries, get_dial_codes, get_events, get_news, get_server_info, get_uptime,
    post_contact, post_donation,
};

#[derive(Serialize)]
pub(crate) struct ChamApiError {
    pub ok: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

pub(crate) fn cham_api_err(status: StatusCode, message: &str) -> Response<Body> {
    (
        status,
        Json(ChamApiError {
            ok: false,
            error: message.to_string(),
            details: None,
        }),
    )
        .into_response()
}

pub(crate) fn cham_api_err_details(
    status: StatusCode,
    message: &str,
    details: impl Display,
) -> Response<Body> {
    (
        status,
        Json(ChamApiError {
            ok: false,
            error: message.to_string(),
            details: Some(details.to_string()),
        }),
    )
        .into_response()
}

pub(crate) fn cham_api_response<T: Serialize>(status: StatusCode, message: T) -> Response<Body> {
    (status, Json(message)).into_response()
}

/// Logs a failed backend call and answers 500 with the backend's message.
pub(crate) fn backend_failure(context: &str, err: &BackendError) -> Response<Body> {
    error!("{context}: {err}");
    cham_api_err_details(StatusCode::INTERNAL_SERVER_ERROR, context, err)
}

/// Parses a JSON body without letting the extractor pick the status code.
pub(crate) fn json_body<T: DeserializeOwned>(body: &Bytes) -> ChamResult<T> {
    Ok(serde_json::from_slice(body)?)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn error_body_omits_empty_details() {
        let response = cham_api_err(StatusCode::BAD_REQUEST, "Missing ids");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = test_support::body_json(response).await;
        assert_eq!(body, serde_json::json!({"ok": false, "error": "Missing ids"}));
    }

    #[tokio::test]
    async fn error_body_carries_details() {
        let response = cham_api_err_details(StatusCode::INTERNAL_SERVER_ERROR, "Failed", "boom");
        let body = test_support::body_json(response).await;
        assert_eq!(body["details"], "boom");
        assert_eq!(body["ok"], false);
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(json_body::<serde_json::Value>(&Bytes::from_static(b"{")).is_err());
        let value: serde_json::Value = json_body(&Bytes::from_static(b"{\"a\":1}")).unwrap();
        assert_eq!(value["a"], 1);
    }
}
