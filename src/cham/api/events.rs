use super::{
    super::{session, state::AppState},
    cham_api_err, cham_api_response,
};
use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{HeaderMap, Response, StatusCode},
};
use axum_extra::extract::cookie::CookieJar;
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, warn};

#[derive(Serialize)]
struct RegisterResponse {
    ok: bool,
    status: String,
}

fn event_id(body: &Bytes) -> Option<String> {
    let value = serde_json::from_slice::<Value>(body).ok()?;
    let event_id = value.get("eventId")?.as_str()?.trim();
    (!event_id.is_empty()).then(|| event_id.to_string())
}

/// POST /api/events/register
pub async fn post_event_register(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    body: Bytes,
) -> Response<Body> {
    let Some(event_id) = event_id(&body) else {
        return cham_api_err(StatusCode::BAD_REQUEST, "Missing eventId");
    };

    let current = match session::current_user(state.backend.as_ref(), &headers, &jar).await {
        Ok(Some(current)) => current,
        Ok(None) => return cham_api_err(StatusCode::UNAUTHORIZED, "Not authenticated"),
        Err(e) => {
            warn!("couldn't resolve session for event registration: {e}");
            return cham_api_err(StatusCode::UNAUTHORIZED, "Not authenticated");
        }
    };

    match state
        .backend
        .register_for_event(&current.access_token, &current.user.id, &event_id)
        .await
    {
        Ok(row) => {
            info!(user = %current.user.id, event = %event_id, "registered for event");
            cham_api_response(
                StatusCode::OK,
                RegisterResponse {
                    ok: true,
                    status: row.status,
                },
            )
        }
        Err(e) => {
            error!("event registration failed: {e}");
            cham_api_err(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::cham::{
        api::test_support::{body_json, post_json, send},
        backend::MemoryBackend,
        router::router,
        session::SESSION_COOKIE,
        state::test_support::state,
    };
    use axum::{
        body::Body,
        http::{Request, StatusCode, header},
    };
    use rstest::rstest;
    use serde_json::{Value, json};
    use std::{path::PathBuf, sync::Arc};

    fn register(body: Value, auth: Option<(&str, &str)>) -> Request<Body> {
        let mut request = Request::post("/api/events/register")
            .header(header::CONTENT_TYPE, "application/json");
        if let Some((name, value)) = auth {
            request = request.header(name, value);
        }
        request.body(Body::from(body.to_string())).unwrap()
    }

    #[rstest]
    #[case(json!({}))]
    #[case(json!({"eventId": 7}))]
    #[case(json!({"eventId": "  "}))]
    #[case(json!({"event_id": "evt-1"}))]
    #[tokio::test]
    async fn missing_event_id_is_rejected_first(#[case] body: Value) {
        let app = router(state(Arc::new(MemoryBackend::new())), PathBuf::from("static"));
        let response = send(&app, register(body, None)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "Missing eventId");
    }

    #[tokio::test]
    async fn anonymous_or_unknown_sessions_are_rejected() {
        let app = router(state(Arc::new(MemoryBackend::new())), PathBuf::from("static"));

        let response = send(&app, post_json("/api/events/register", json!({"eventId": "e"}))).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["error"], "Not authenticated");

        let response = send(
            &app,
            register(json!({"eventId": "e"}), Some(("authorization", "Bearer stale"))),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn registration_is_idempotent() {
        let backend = Arc::new(MemoryBackend::new());
        let session = backend.issue_session("member@cham.org").await;
        let app = router(state(backend.clone()), PathBuf::from("static"));
        let bearer = format!("Bearer {}", session.access_token);

        for _ in 0..2 {
            let response = send(
                &app,
                register(json!({"eventId": "evt-1"}), Some(("authorization", &bearer))),
            )
            .await;
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(
                body_json(response).await,
                json!({"ok": true, "status": "registered"})
            );
        }

        assert_eq!(backend.snapshot().await.registrations.len(), 1);
    }

    #[tokio::test]
    async fn session_cookie_authenticates_too() {
        let backend = Arc::new(MemoryBackend::new());
        let session = backend.issue_session("member@cham.org").await;
        let app = router(state(backend.clone()), PathBuf::from("static"));
        let cookie = format!("{SESSION_COOKIE}={}", session.access_token);

        let response = send(
            &app,
            register(json!({"eventId": "evt-2"}), Some(("cookie", &cookie))),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}
