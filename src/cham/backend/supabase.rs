//! Reqwest-backed adapter for the hosted backend's auth, rest and storage
//! APIs.

use super::{
    AuthSession, AuthUser, Backend, BackendError, BackendResult, EventRegistrationRow, EventRow,
    MembershipRow, NewMembership, NewPayment, NewProfile, NewsRow, PaymentRow, ProfileRow,
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::{
    Client, Method, RequestBuilder, Response, StatusCode, Url,
    header::{AUTHORIZATION, CONTENT_TYPE},
};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

const APIKEY: &str = "apikey";
const PREFER: &str = "Prefer";
const RETURN_REPRESENTATION: &str = "return=representation";

pub struct SupabaseCredentials {
    pub url: String,
    pub anon_key: String,
    pub service_role_key: Option<String>,
}

pub struct SupabaseBackend {
    client: Client,
    base: Url,
    anon_key: String,
    service_role_key: Option<String>,
    bucket: String,
}

impl SupabaseBackend {
    /// # Errors
    ///
    /// Fails when the base URL doesn't parse or the HTTP client can't be
    /// built.
    pub fn new(
        credentials: SupabaseCredentials,
        bucket: &str,
        timeout: Duration,
    ) -> BackendResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base: normalize_base(&credentials.url)?,
            anon_key: credentials.anon_key,
            service_role_key: credentials.service_role_key,
            bucket: bucket.to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> BackendResult<Url> {
        self.base
            .join(path)
            .map_err(|e| BackendError::Decode(format!("invalid endpoint {path}: {e}")))
    }

    /// Service role when available; row level security applies otherwise.
    fn server_key(&self) -> &str {
        self.service_role_key.as_deref().unwrap_or(&self.anon_key)
    }

    fn request(&self, method: Method, path: &str, bearer: &str) -> BackendResult<RequestBuilder> {
        self.request_with_key(method, path, &self.anon_key, bearer)
    }

    fn request_with_key(
        &self,
        method: Method,
        path: &str,
        apikey: &str,
        bearer: &str,
    ) -> BackendResult<RequestBuilder> {
        Ok(self
            .client
            .request(method, self.endpoint(path)?)
            .header(APIKEY, apikey)
            .header(AUTHORIZATION, format!("Bearer {bearer}")))
    }

    fn table(&self, method: Method, table: &str) -> BackendResult<RequestBuilder> {
        self.request(method, &format!("rest/v1/{table}"), self.server_key())
    }

    async fn insert_one<B, T>(&self, table: &'static str, body: &B) -> BackendResult<T>
    where
        B: serde::Serialize + Sync,
        T: DeserializeOwned,
    {
        let response = self
            .table(Method::POST, table)?
            .header(PREFER, RETURN_REPRESENTATION)
            .json(body)
            .send()
            .await?;
        first_row(read_json::<Vec<T>>(response).await?, table)
    }

    async fn update_one<T: DeserializeOwned>(
        &self,
        table: &'static str,
        id: &str,
        patch: Value,
    ) -> BackendResult<T> {
        let response = self
            .table(Method::PATCH, table)?
            .query(&[("id", eq(id))])
            .header(PREFER, RETURN_REPRESENTATION)
            .json(&patch)
            .send()
            .await?;
        first_row(read_json::<Vec<T>>(response).await?, table)
    }

    async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, String)],
    ) -> BackendResult<Vec<T>> {
        let response = self.table(Method::GET, table)?.query(query).send().await?;
        read_json(response).await
    }
}

#[async_trait]
impl Backend for SupabaseBackend {
    fn can_invite(&self) -> bool {
        self.service_role_key.is_some()
    }

    async fn invite_user(&self, email: &str, redirect_to: &str) -> BackendResult<()> {
        let service_key = self
            .service_role_key
            .as_deref()
            .ok_or(BackendError::NotConfigured("admin invites"))?;

        let response = self
            .request_with_key(Method::POST, "auth/v1/invite", service_key, service_key)?
            .query(&[("redirect_to", redirect_to)])
            .json(&json!({ "email": email }))
            .send()
            .await?;
        ensure_success(response).await
    }

    async fn send_magic_link(&self, email: &str, redirect_to: &str) -> BackendResult<()> {
        let response = self
            .request(Method::POST, "auth/v1/otp", &self.anon_key)?
            .query(&[("redirect_to", redirect_to)])
            .json(&json!({ "email": email, "create_user": true }))
            .send()
            .await?;
        ensure_success(response).await
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        redirect_to: &str,
    ) -> BackendResult<Option<AuthUser>> {
        let response = self
            .request(Method::POST, "auth/v1/signup", &self.anon_key)?
            .query(&[("redirect_to", redirect_to)])
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;
        let body: Value = read_json(response).await?;
        user_from_signup(body)
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> BackendResult<AuthSession> {
        let response = self
            .request(Method::POST, "auth/v1/token", &self.anon_key)?
            .query(&[("grant_type", "password")])
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;
        read_json(response).await
    }

    async fn get_user(&self, access_token: &str) -> BackendResult<Option<AuthUser>> {
        let response = self
            .request(Method::GET, "auth/v1/user", access_token)?
            .send()
            .await?;

        if matches!(
            response.status(),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
        ) {
            debug!("access token rejected by backend");
            return Ok(None);
        }
        read_json(response).await.map(Some)
    }

    async fn find_profiles_by_email(&self, email: &str) -> BackendResult<Vec<ProfileRow>> {
        self.select("profiles", &[("select", "*".to_string()), ("email", eq(email))])
            .await
    }

    async fn find_profiles_by_identity(
        &self,
        first_name_latin: &str,
        last_name_latin: &str,
        date_of_birth: NaiveDate,
    ) -> BackendResult<Vec<ProfileRow>> {
        let candidates: Vec<ProfileRow> = self
            .select("profiles", &identity_query(date_of_birth))
            .await?;
        Ok(candidates
            .into_iter()
            .filter(|profile| same_identity(profile, first_name_latin, last_name_latin))
            .collect())
    }

    async fn find_profile_by_user(&self, user_id: &str) -> BackendResult<Option<ProfileRow>> {
        let rows: Vec<ProfileRow> = self
            .select(
                "profiles",
                &[
                    ("select", "*".to_string()),
                    ("user_id", eq(user_id)),
                    ("limit", "1".to_string()),
                ],
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn insert_profile(&self, profile: &NewProfile) -> BackendResult<ProfileRow> {
        self.insert_one("profiles", profile).await
    }

    async fn memberships_for_profile(
        &self,
        profile_id: &str,
    ) -> BackendResult<Vec<MembershipRow>> {
        self.select(
            "memberships",
            &[("select", "*".to_string()), ("profile_id", eq(profile_id))],
        )
        .await
    }

    async fn insert_membership(&self, membership: &NewMembership) -> BackendResult<MembershipRow> {
        self.insert_one("memberships", membership).await
    }

    async fn activate_membership(
        &self,
        membership_id: &str,
        started_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> BackendResult<MembershipRow> {
        self.update_one(
            "memberships",
            membership_id,
            json!({
                "status": "active",
                "started_at": started_at.to_rfc3339(),
                "expires_at": expires_at.to_rfc3339(),
            }),
        )
        .await
    }

    async fn insert_payment(&self, payment: &NewPayment) -> BackendResult<PaymentRow> {
        self.insert_one("payments", payment).await
    }

    async fn mark_payment_succeeded(&self, payment_id: &str) -> BackendResult<PaymentRow> {
        self.update_one("payments", payment_id, json!({ "status": "succeeded" }))
            .await
    }

    async fn list_pending_payments(&self) -> BackendResult<Vec<PaymentRow>> {
        self.select(
            "payments",
            &[
                ("select", "*".to_string()),
                ("status", eq("pending")),
                ("order", "created_at.asc".to_string()),
            ],
        )
        .await
    }

    async fn upload_document(
        &self,
        path: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> BackendResult<String> {
        let response = self
            .request(
                Method::POST,
                &format!("storage/v1/object/{}/{path}", self.bucket),
                self.server_key(),
            )?
            .header(CONTENT_TYPE, content_type)
            .header("x-upsert", "false")
            .body(bytes)
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(path.to_string())
    }

    async fn register_for_event(
        &self,
        access_token: &str,
        user_id: &str,
        event_id: &str,
    ) -> BackendResult<EventRegistrationRow> {
        let response = self
            .request(Method::POST, "rest/v1/event_registrations", access_token)?
            .query(&[
                ("on_conflict", "user_id,event_id"),
                ("select", "event_id,status"),
            ])
            .header(
                PREFER,
                format!("resolution=merge-duplicates,{RETURN_REPRESENTATION}"),
            )
            .json(&json!({
                "user_id": user_id,
                "event_id": event_id,
                "status": "registered",
            }))
            .send()
            .await?;
        Ok(registration_or_default(read_json(response).await?, event_id))
    }

    async fn registrations_for_user(
        &self,
        access_token: &str,
        user_id: &str,
    ) -> BackendResult<Vec<EventRegistrationRow>> {
        let response = self
            .request(Method::GET, "rest/v1/event_registrations", access_token)?
            .query(&[("select", "event_id,status".to_string()), ("user_id", eq(user_id))])
            .send()
            .await?;
        read_json(response).await
    }

    async fn list_news(&self) -> BackendResult<Vec<NewsRow>> {
        self.select(
            "news",
            &[
                ("select", "title,slug,category,excerpt,published_at".to_string()),
                ("order", "published_at.desc".to_string()),
            ],
        )
        .await
    }

    async fn list_events(&self) -> BackendResult<Vec<EventRow>> {
        self.select(
            "events",
            &[("select", "*".to_string()), ("order", "start_at.asc".to_string())],
        )
        .await
    }
}

fn eq(value: impl std::fmt::Display) -> String {
    format!("eq.{value}")
}

/// Joins need a trailing slash or the last path segment gets replaced.
fn normalize_base(url: &str) -> BackendResult<Url> {
    let trimmed = url.trim().trim_end_matches('/');
    Url::parse(&format!("{trimmed}/"))
        .map_err(|e| BackendError::Decode(format!("invalid backend url {url}: {e}")))
}

/// Names stay out of the filter: PostgREST patterns treat `*`, `%` and `_`
/// as wildcards, so they are compared exactly after the birth date lookup.
fn identity_query(date_of_birth: NaiveDate) -> Vec<(&'static str, String)> {
    vec![
        ("select", "*".to_string()),
        ("date_of_birth", eq(date_of_birth)),
    ]
}

fn same_identity(profile: &ProfileRow, first_name_latin: &str, last_name_latin: &str) -> bool {
    profile.first_name_latin.eq_ignore_ascii_case(first_name_latin)
        && profile.last_name_latin.eq_ignore_ascii_case(last_name_latin)
}

/// Row level security may hide the upserted row from the caller.
fn registration_or_default(
    rows: Vec<EventRegistrationRow>,
    event_id: &str,
) -> EventRegistrationRow {
    rows.into_iter().next().unwrap_or_else(|| EventRegistrationRow {
        event_id: event_id.to_string(),
        status: "registered".to_string(),
    })
}

fn first_row<T>(rows: Vec<T>, what: &'static str) -> BackendResult<T> {
    rows.into_iter().next().ok_or(BackendError::NotFound(what))
}

async fn read_json<T: DeserializeOwned>(response: Response) -> BackendResult<T> {
    let status = response.status();
    let body = response.bytes().await?;
    if !status.is_success() {
        return Err(api_error(status, &body));
    }
    serde_json::from_slice(&body).map_err(|e| BackendError::Decode(e.to_string()))
}

async fn ensure_success(response: Response) -> BackendResult<()> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.bytes().await?;
    Err(api_error(status, &body))
}

/// Pulls the human readable message out of whichever error shape the
/// backend used.
fn api_error(status: StatusCode, body: &[u8]) -> BackendError {
    let message = serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|value| {
            ["message", "msg", "error_description", "error"]
                .iter()
                .find_map(|key| value.get(key).and_then(Value::as_str).map(str::to_string))
        })
        .or_else(|| {
            let text = String::from_utf8_lossy(body).trim().to_string();
            (!text.is_empty()).then_some(text)
        })
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("backend error")
                .to_string()
        });

    BackendError::Api { status, message }
}

/// Sign-up answers with a bare user when confirmation is pending and with
/// a session otherwise. An address that is already registered comes back as
/// an obfuscated user with no identities.
fn user_from_signup(body: Value) -> BackendResult<Option<AuthUser>> {
    let user = match body.get("user") {
        Some(user) if user.is_object() => user.clone(),
        _ => body,
    };
    if user
        .get("identities")
        .and_then(Value::as_array)
        .is_some_and(Vec::is_empty)
    {
        return Err(BackendError::Api {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            message: "User already registered".to_string(),
        });
    }
    Ok(serde_json::from_value(user).ok())
}
