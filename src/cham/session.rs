//! Access-token plumbing between the browser and the hosted auth API.

use super::backend::{AuthUser, Backend, BackendResult};
use axum::http::{HeaderMap, header::AUTHORIZATION};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

pub const SESSION_COOKIE: &str = "cham-access-token";

/// Bearer header first, then the session cookie.
pub fn access_token(headers: &HeaderMap, jar: &CookieJar) -> Option<String> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty());

    bearer.map(str::to_string).or_else(|| {
        jar.get(SESSION_COOKIE)
            .map(|cookie| cookie.value().to_string())
            .filter(|token| !token.is_empty())
    })
}

/// Browser-session cookie; the backend decides when the token expires.
pub fn session_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .build()
}

pub fn removal_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, "")).path("/").build()
}

/// The signed-in user with the token that proved it, if any.
pub struct CurrentUser {
    pub user: AuthUser,
    pub access_token: String,
}

pub async fn current_user(
    backend: &dyn Backend,
    headers: &HeaderMap,
    jar: &CookieJar,
) -> BackendResult<Option<CurrentUser>> {
    let Some(access_token) = access_token(headers, jar) else {
        return Ok(None);
    };

    Ok(backend
        .get_user(&access_token)
        .await?
        .map(|user| CurrentUser { user, access_token }))
}
