//! Seam to the hosted backend (auth, tables, object storage).
//!
//! Handlers only talk to [`Backend`]; [`SupabaseBackend`] performs the HTTP
//! calls and [`MemoryBackend`] keeps everything in-process for local runs
//! without credentials and for tests.

pub mod memory;
pub mod models;
pub mod supabase;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::StatusCode;
use thiserror::Error;

pub use memory::MemoryBackend;
pub use models::*;
pub use supabase::SupabaseBackend;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("{message}")]
    Api { status: StatusCode, message: String },
    #[error("request to backend failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected backend response: {0}")]
    Decode(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("backend is not configured for {0}")]
    NotConfigured(&'static str),
}

pub type BackendResult<T> = Result<T, BackendError>;

#[async_trait]
pub trait Backend: Send + Sync {
    /// Whether admin-only auth calls (invites) are available.
    fn can_invite(&self) -> bool;

    async fn invite_user(&self, email: &str, redirect_to: &str) -> BackendResult<()>;
    async fn send_magic_link(&self, email: &str, redirect_to: &str) -> BackendResult<()>;
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        redirect_to: &str,
    ) -> BackendResult<Option<AuthUser>>;
    async fn sign_in_with_password(&self, email: &str, password: &str)
    -> BackendResult<AuthSession>;
    /// Resolves the user behind an access token; `None` when the token is
    /// unknown or expired.
    async fn get_user(&self, access_token: &str) -> BackendResult<Option<AuthUser>>;

    async fn find_profiles_by_email(&self, email: &str) -> BackendResult<Vec<ProfileRow>>;
    async fn find_profiles_by_identity(
        &self,
        first_name_latin: &str,
        last_name_latin: &str,
        date_of_birth: NaiveDate,
    ) -> BackendResult<Vec<ProfileRow>>;
    async fn find_profile_by_user(&self, user_id: &str) -> BackendResult<Option<ProfileRow>>;
    async fn insert_profile(&self, profile: &NewProfile) -> BackendResult<ProfileRow>;

    async fn memberships_for_profile(&self, profile_id: &str)
    -> BackendResult<Vec<MembershipRow>>;
    async fn insert_membership(&self, membership: &NewMembership) -> BackendResult<MembershipRow>;
    async fn activate_membership(
        &self,
        membership_id: &str,
        started_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> BackendResult<MembershipRow>;

    async fn insert_payment(&self, payment: &NewPayment) -> BackendResult<PaymentRow>;
    async fn mark_payment_succeeded(&self, payment_id: &str) -> BackendResult<PaymentRow>;
    async fn list_pending_payments(&self) -> BackendResult<Vec<PaymentRow>>;

    /// Stores a document and returns its path inside the bucket.
    async fn upload_document(
        &self,
        path: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> BackendResult<String>;

    /// Upserts on `(user_id, event_id)`, acting as the user.
    async fn register_for_event(
        &self,
        access_token: &str,
        user_id: &str,
        event_id: &str,
    ) -> BackendResult<EventRegistrationRow>;
    async fn registrations_for_user(
        &self,
        access_token: &str,
        user_id: &str,
    ) -> BackendResult<Vec<EventRegistrationRow>>;

    async fn list_news(&self) -> BackendResult<Vec<NewsRow>>;
    async fn list_events(&self) -> BackendResult<Vec<EventRow>>;
}
