//! In-process stand-in for the hosted backend.
//!
//! Used when no backend credentials are configured so the site keeps
//! working locally, and by the handler tests.

use super::{
    AuthSession, AuthUser, Backend, BackendError, BackendResult, EventRegistrationRow, EventRow,
    MembershipRow, MembershipStatus, NewMembership, NewPayment, NewProfile, NewsRow, PaymentRow,
    PaymentStatus, ProfileRow,
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::StatusCode;
use std::{
    collections::HashMap,
    sync::atomic::{AtomicBool, Ordering},
};
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub struct MemoryTables {
    pub users: Vec<(AuthUser, Option<String>)>,
    pub sessions: HashMap<String, String>,
    pub profiles: Vec<ProfileRow>,
    pub memberships: Vec<MembershipRow>,
    pub payments: Vec<PaymentRow>,
    pub registrations: Vec<(String, EventRegistrationRow)>,
    pub documents: HashMap<String, (String, Vec<u8>)>,
    pub magic_links: Vec<String>,
    pub news: Vec<NewsRow>,
    pub events: Vec<EventRow>,
}

#[derive(Default)]
pub struct MemoryBackend {
    tables: Mutex<MemoryTables>,
    unavailable: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn with_content(news: Vec<NewsRow>, events: Vec<EventRow>) -> Self {
        Self {
            tables: Mutex::new(MemoryTables {
                news,
                events,
                ..MemoryTables::default()
            }),
            unavailable: AtomicBool::new(false),
        }
    }

    #[cfg(test)]
    /// Makes every subsequent call fail the way an unreachable backend would.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    #[cfg(test)]
    pub async fn snapshot(&self) -> MemoryTables {
        self.tables.lock().await.clone()
    }

    #[cfg(test)]
    /// Creates (or reuses) a user for `email` and hands out a fresh token.
    pub async fn issue_session(&self, email: &str) -> AuthSession {
        let mut tables = self.tables.lock().await;
        let user = find_or_create_user(&mut tables, email, None);
        let access_token = Uuid::new_v4().to_string();
        tables
            .sessions
            .insert(access_token.clone(), user.id.clone());

        AuthSession {
            access_token,
            refresh_token: None,
            expires_in: Some(3600),
            user: Some(user),
        }
    }

    fn check_available(&self) -> BackendResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(BackendError::Api {
                status: StatusCode::SERVICE_UNAVAILABLE,
                message: "backend unavailable".to_string(),
            });
        }
        Ok(())
    }
}

fn find_or_create_user(
    tables: &mut MemoryTables,
    email: &str,
    password: Option<&str>,
) -> AuthUser {
    if let Some((user, _)) = tables
        .users
        .iter()
        .find(|(user, _)| user.email.as_deref() == Some(email))
    {
        return user.clone();
    }

    let user = AuthUser {
        id: Uuid::new_v4().to_string(),
        email: Some(email.to_string()),
    };
    tables
        .users
        .push((user.clone(), password.map(str::to_string)));
    user
}

#[async_trait]
impl Backend for MemoryBackend {
    fn can_invite(&self) -> bool {
        false
    }

    async fn invite_user(&self, _email: &str, _redirect_to: &str) -> BackendResult<()> {
        Err(BackendError::NotConfigured("admin invites"))
    }

    async fn send_magic_link(&self, email: &str, redirect_to: &str) -> BackendResult<()> {
        self.check_available()?;
        info!("magic link for {email} would redirect to {redirect_to}");
        self.tables.lock().await.magic_links.push(email.to_string());
        Ok(())
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        _redirect_to: &str,
    ) -> BackendResult<Option<AuthUser>> {
        self.check_available()?;
        let mut tables = self.tables.lock().await;
        if tables
            .users
            .iter()
            .any(|(user, _)| user.email.as_deref() == Some(email))
        {
            return Err(BackendError::Api {
                status: StatusCode::UNPROCESSABLE_ENTITY,
                message: "User already registered".to_string(),
            });
        }
        Ok(Some(find_or_create_user(&mut tables, email, Some(password))))
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> BackendResult<AuthSession> {
        self.check_available()?;
        let mut tables = self.tables.lock().await;
        let user = tables
            .users
            .iter()
            .find(|(user, stored)| {
                user.email.as_deref() == Some(email) && stored.as_deref() == Some(password)
            })
            .map(|(user, _)| user.clone())
            .ok_or_else(|| BackendError::Api {
                status: StatusCode::BAD_REQUEST,
                message: "Invalid login credentials".to_string(),
            })?;

        let access_token = Uuid::new_v4().to_string();
        tables
            .sessions
            .insert(access_token.clone(), user.id.clone());
        Ok(AuthSession {
            access_token,
            refresh_token: None,
            expires_in: Some(3600),
            user: Some(user),
        })
    }

    async fn get_user(&self, access_token: &str) -> BackendResult<Option<AuthUser>> {
        self.check_available()?;
        let tables = self.tables.lock().await;
        let Some(user_id) = tables.sessions.get(access_token) else {
            return Ok(None);
        };
        Ok(tables
            .users
            .iter()
            .find(|(user, _)| &user.id == user_id)
            .map(|(user, _)| user.clone()))
    }

    async fn find_profiles_by_email(&self, email: &str) -> BackendResult<Vec<ProfileRow>> {
        self.check_available()?;
        let tables = self.tables.lock().await;
        Ok(tables
            .profiles
            .iter()
            .filter(|profile| profile.email == email)
            .cloned()
            .collect())
    }

    async fn find_profiles_by_identity(
        &self,
        first_name_latin: &str,
        last_name_latin: &str,
        date_of_birth: NaiveDate,
    ) -> BackendResult<Vec<ProfileRow>> {
        self.check_available()?;
        let tables = self.tables.lock().await;
        Ok(tables
            .profiles
            .iter()
            .filter(|profile| {
                profile.first_name_latin.eq_ignore_ascii_case(first_name_latin)
                    && profile.last_name_latin.eq_ignore_ascii_case(last_name_latin)
                    && profile.date_of_birth == date_of_birth
            })
            .cloned()
            .collect())
    }

    async fn find_profile_by_user(&self, user_id: &str) -> BackendResult<Option<ProfileRow>> {
        self.check_available()?;
        let tables = self.tables.lock().await;
        Ok(tables
            .profiles
            .iter()
            .find(|profile| profile.user_id.as_deref() == Some(user_id))
            .cloned())
    }

    async fn insert_profile(&self, profile: &NewProfile) -> BackendResult<ProfileRow> {
        self.check_available()?;
        let row = ProfileRow {
            id: Uuid::new_v4().to_string(),
            user_id: profile.user_id.clone(),
            email: profile.email.clone(),
            first_name_latin: profile.first_name_latin.clone(),
            last_name_latin: profile.last_name_latin.clone(),
            date_of_birth: profile.date_of_birth,
        };
        self.tables.lock().await.profiles.push(row.clone());
        Ok(row)
    }

    async fn memberships_for_profile(
        &self,
        profile_id: &str,
    ) -> BackendResult<Vec<MembershipRow>> {
        self.check_available()?;
        let tables = self.tables.lock().await;
        Ok(tables
            .memberships
            .iter()
            .filter(|membership| membership.profile_id == profile_id)
            .cloned()
            .collect())
    }

    async fn insert_membership(&self, membership: &NewMembership) -> BackendResult<MembershipRow> {
        self.check_available()?;
        let row = MembershipRow {
            id: Uuid::new_v4().to_string(),
            profile_id: membership.profile_id.clone(),
            status: membership.status,
            started_at: membership.started_at,
            expires_at: membership.expires_at,
            receipt_path: membership.receipt_path.clone(),
        };
        self.tables.lock().await.memberships.push(row.clone());
        Ok(row)
    }

    async fn activate_membership(
        &self,
        membership_id: &str,
        started_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> BackendResult<MembershipRow> {
        self.check_available()?;
        let mut tables = self.tables.lock().await;
        let membership = tables
            .memberships
            .iter_mut()
            .find(|membership| membership.id == membership_id)
            .ok_or(BackendError::NotFound("memberships"))?;

        membership.status = MembershipStatus::Active;
        membership.started_at = Some(started_at);
        membership.expires_at = Some(expires_at);
        Ok(membership.clone())
    }

    async fn insert_payment(&self, payment: &NewPayment) -> BackendResult<PaymentRow> {
        self.check_available()?;
        let row = PaymentRow {
            id: Uuid::new_v4().to_string(),
            profile_id: payment.profile_id.clone(),
            membership_id: payment.membership_id.clone(),
            purpose: payment.purpose,
            amount_cents: payment.amount_cents,
            currency: payment.currency.clone(),
            method: payment.method,
            status: payment.status,
            donor_name: payment.donor_name.clone(),
            created_at: Some(Utc::now()),
        };
        self.tables.lock().await.payments.push(row.clone());
        Ok(row)
    }

    async fn mark_payment_succeeded(&self, payment_id: &str) -> BackendResult<PaymentRow> {
        self.check_available()?;
        let mut tables = self.tables.lock().await;
        let payment = tables
            .payments
            .iter_mut()
            .find(|payment| payment.id == payment_id)
            .ok_or(BackendError::NotFound("payments"))?;

        payment.status = PaymentStatus::Succeeded;
        Ok(payment.clone())
    }

    async fn list_pending_payments(&self) -> BackendResult<Vec<PaymentRow>> {
        self.check_available()?;
        let tables = self.tables.lock().await;
        Ok(tables
            .payments
            .iter()
            .filter(|payment| payment.status == PaymentStatus::Pending)
            .cloned()
            .collect())
    }

    async fn upload_document(
        &self,
        path: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> BackendResult<String> {
        self.check_available()?;
        let mut tables = self.tables.lock().await;
        if tables.documents.contains_key(path) {
            return Err(BackendError::Api {
                status: StatusCode::CONFLICT,
                message: "The resource already exists".to_string(),
            });
        }
        tables
            .documents
            .insert(path.to_string(), (content_type.to_string(), bytes));
        Ok(path.to_string())
    }

    async fn register_for_event(
        &self,
        access_token: &str,
        user_id: &str,
        event_id: &str,
    ) -> BackendResult<EventRegistrationRow> {
        self.check_available()?;
        let mut tables = self.tables.lock().await;
        if tables.sessions.get(access_token).map(String::as_str) != Some(user_id) {
            return Err(BackendError::Api {
                status: StatusCode::FORBIDDEN,
                message: "new row violates row-level security policy".to_string(),
            });
        }

        let row = EventRegistrationRow {
            event_id: event_id.to_string(),
            status: "registered".to_string(),
        };
        match tables
            .registrations
            .iter_mut()
            .find(|(owner, existing)| owner == user_id && existing.event_id == event_id)
        {
            Some((_, existing)) => *existing = row.clone(),
            None => tables.registrations.push((user_id.to_string(), row.clone())),
        }
        Ok(row)
    }

    async fn registrations_for_user(
        &self,
        _access_token: &str,
        user_id: &str,
    ) -> BackendResult<Vec<EventRegistrationRow>> {
        self.check_available()?;
        let tables = self.tables.lock().await;
        Ok(tables
            .registrations
            .iter()
            .filter(|(owner, _)| owner == user_id)
            .map(|(_, row)| row.clone())
            .collect())
    }

    async fn list_news(&self) -> BackendResult<Vec<NewsRow>> {
        self.check_available()?;
        Ok(self.tables.lock().await.news.clone())
    }

    async fn list_events(&self) -> BackendResult<Vec<EventRow>> {
        self.check_available()?;
        Ok(self.tables.lock().await.events.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn event_registration_is_an_upsert() {
        let backend = MemoryBackend::new();
        let session = backend.issue_session("member@cham.org").await;
        let user_id = session.user.as_ref().unwrap().id.clone();

        backend
            .register_for_event(&session.access_token, &user_id, "evt-1")
            .await
            .unwrap();
        backend
            .register_for_event(&session.access_token, &user_id, "evt-1")
            .await
            .unwrap();

        let registrations = backend
            .registrations_for_user(&session.access_token, &user_id)
            .await
            .unwrap();
        assert_eq!(registrations.len(), 1);
        assert_eq!(registrations[0].status, "registered");
    }

    #[tokio::test]
    async fn registration_requires_matching_session() {
        let backend = MemoryBackend::new();
        let session = backend.issue_session("member@cham.org").await;

        let err = backend
            .register_for_event(&session.access_token, "someone-else", "evt-1")
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Api { status, .. } if status == StatusCode::FORBIDDEN));
    }

    #[tokio::test]
    async fn password_sign_in_checks_credentials() {
        let backend = MemoryBackend::new();
        backend
            .sign_up("a@cham.org", "correct horse", "http://x/auth/callback")
            .await
            .unwrap();

        assert!(
            backend
                .sign_in_with_password("a@cham.org", "wrong")
                .await
                .is_err()
        );
        let session = backend
            .sign_in_with_password("a@cham.org", "correct horse")
            .await
            .unwrap();
        let user = backend.get_user(&session.access_token).await.unwrap();
        assert_eq!(user.unwrap().email.as_deref(), Some("a@cham.org"));
        assert!(backend.get_user("bogus").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unavailable_backend_fails_every_call() {
        let backend = MemoryBackend::new();
        backend.set_unavailable(true);
        assert!(backend.list_news().await.is_err());
        backend.set_unavailable(false);
        assert!(backend.list_news().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn updating_unknown_rows_reports_not_found() {
        let backend = MemoryBackend::new();
        assert!(matches!(
            backend.mark_payment_succeeded("nope").await,
            Err(BackendError::NotFound(_))
        ));
        let now = Utc::now();
        assert!(matches!(
            backend.activate_membership("nope", now, now).await,
            Err(BackendError::NotFound(_))
        ));
    }
}
