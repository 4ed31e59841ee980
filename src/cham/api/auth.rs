use super::{
    super::{
        backend::{AuthUser, BackendError},
        session::{removal_cookie, session_cookie},
        state::AppState,
    },
    backend_failure, cham_api_err, cham_api_response, json_body,
};
use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{Response, StatusCode},
    response::IntoResponse,
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info};

#[derive(Serialize)]
struct MagicLinkResponse {
    ok: bool,
    mode: &'static str,
}

#[derive(Serialize)]
struct SessionResponse {
    ok: bool,
    user: AuthUser,
}

#[derive(Serialize)]
struct OkResponse {
    ok: bool,
}

#[derive(Deserialize)]
struct LoginRequest {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

#[derive(Deserialize)]
struct SessionRequest {
    #[serde(default)]
    access_token: String,
}

fn string_field(body: &Bytes, field: &str) -> Option<String> {
    serde_json::from_slice::<Value>(body)
        .ok()?
        .get(field)?
        .as_str()
        .map(str::to_string)
}

/// POST /api/auth/magic-link
pub async fn post_magic_link(State(state): State<AppState>, body: Bytes) -> Response<Body> {
    let Some(email) = string_field(&body, "email").filter(|email| email.contains('@')) else {
        return cham_api_err(StatusCode::BAD_REQUEST, "Invalid email");
    };

    if !state.settings.backend_configured {
        return cham_api_err(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Missing backend configuration",
        );
    }

    let email = email.trim().to_lowercase();
    let redirect_to = &state.settings.auth_redirect;

    let (result, mode) = if state.backend.can_invite() {
        (
            state.backend.invite_user(&email, redirect_to).await,
            "admin_invite",
        )
    } else {
        (
            state.backend.send_magic_link(&email, redirect_to).await,
            "anon_magiclink",
        )
    };

    match result {
        Ok(()) => {
            info!("sent {mode} link to {email}");
            cham_api_response(StatusCode::OK, MagicLinkResponse { ok: true, mode })
        }
        Err(e) => {
            error!("{mode} for {email} failed: {e}");
            cham_api_err(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
        }
    }
}

/// POST /api/auth/login
pub async fn post_login(
    State(state): State<AppState>,
    jar: CookieJar,
    body: Bytes,
) -> Response<Body> {
    let Ok(request) = json_body::<LoginRequest>(&body) else {
        return cham_api_err(StatusCode::BAD_REQUEST, "Invalid request body");
    };

    let email = request.email.trim().to_lowercase();
    if email.is_empty() || request.password.is_empty() {
        return cham_api_err(StatusCode::BAD_REQUEST, "Missing email or password");
    }

    let session = match state
        .backend
        .sign_in_with_password(&email, &request.password)
        .await
    {
        Ok(session) => session,
        Err(BackendError::Api { status, message }) if status.is_client_error() => {
            return cham_api_err(StatusCode::UNAUTHORIZED, &message);
        }
        Err(e) => return backend_failure("Failed to sign in", &e),
    };

    let user = match session.user {
        Some(user) => user,
        None => match state.backend.get_user(&session.access_token).await {
            Ok(Some(user)) => user,
            Ok(None) => return cham_api_err(StatusCode::UNAUTHORIZED, "Not authenticated"),
            Err(e) => return backend_failure("Failed to sign in", &e),
        },
    };

    let cookie = session_cookie(session.access_token, state.settings.secure_cookies);
    (
        jar.add(cookie),
        cham_api_response(StatusCode::OK, SessionResponse { ok: true, user }),
    )
        .into_response()
}

/// POST /api/auth/session, called by the auth callback page with the token
/// it found in the URL fragment.
pub async fn post_session(
    State(state): State<AppState>,
    jar: CookieJar,
    body: Bytes,
) -> Response<Body> {
    let token = json_body::<SessionRequest>(&body)
        .map(|request| request.access_token.trim().to_string())
        .unwrap_or_default();
    if token.is_empty() {
        return cham_api_err(StatusCode::BAD_REQUEST, "Missing access_token");
    }

    let user = match state.backend.get_user(&token).await {
        Ok(Some(user)) => user,
        Ok(None) => return cham_api_err(StatusCode::UNAUTHORIZED, "Not authenticated"),
        Err(e) => return backend_failure("Failed to verify session", &e),
    };

    let cookie = session_cookie(token, state.settings.secure_cookies);
    (
        jar.add(cookie),
        cham_api_response(StatusCode::OK, SessionResponse { ok: true, user }),
    )
        .into_response()
}

/// POST /api/auth/logout
pub async fn post_logout(jar: CookieJar) -> impl IntoResponse {
    (
        jar.remove(removal_cookie()),
        cham_api_response(StatusCode::OK, OkResponse { ok: true }),
    )
}
