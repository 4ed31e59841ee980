use super::super::{
    super::{
        mailer::{MailMessage, MailOutcome},
        membership::validation::normalize_email,
        state::AppState,
    },
    cham_api_err, cham_api_err_details, cham_api_response, json_body,
};
use axum::{body::Bytes, extract::State, http::StatusCode, response::IntoResponse};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, warn};

pub const MAX_MESSAGE_CHARS: usize = 5000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContactError {
    #[error("الاسم مطلوب")]
    MissingName,
    #[error("البريد الإلكتروني غير صحيح")]
    InvalidEmail,
    #[error("الرسالة مطلوبة")]
    MissingMessage,
    #[error("الرسالة طويلة جداً")]
    MessageTooLong,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ContactRequest {
    pub name: String,
    pub email: String,
    pub message: String,
}

#[derive(Serialize)]
struct ContactResponse {
    ok: bool,
    delivered: bool,
}

impl ContactRequest {
    /// Trimmed fields, email lowercased.
    pub fn validate(self) -> Result<Self, ContactError> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(ContactError::MissingName);
        }
        let email = normalize_email(&self.email).ok_or(ContactError::InvalidEmail)?;
        let message = self.message.trim().to_string();
        if message.is_empty() {
            return Err(ContactError::MissingMessage);
        }
        if message.chars().count() > MAX_MESSAGE_CHARS {
            return Err(ContactError::MessageTooLong);
        }
        Ok(Self {
            name,
            email,
            message,
        })
    }
}

pub async fn post_contact(State(state): State<AppState>, body: Bytes) -> impl IntoResponse {
    let request: ContactRequest = match json_body(&body) {
        Ok(request) => request,
        Err(_) => return cham_api_err(StatusCode::BAD_REQUEST, "Invalid request body"),
    };

    let request = match request.validate() {
        Ok(request) => request,
        Err(e) => return cham_api_err(StatusCode::BAD_REQUEST, &e.to_string()),
    };

    if state.settings.admin_recipients.is_empty() {
        warn!("contact message from {} dropped, no admin recipients", request.email);
        return cham_api_response(
            StatusCode::ACCEPTED,
            ContactResponse {
                ok: true,
                delivered: false,
            },
        );
    }

    let message = MailMessage::text(
        state.settings.admin_recipients.clone(),
        format!("رسالة جديدة من {}", request.name),
        format!(
            "الاسم: {}\nالبريد: {}\n\n{}",
            request.name, request.email, request.message
        ),
    );

    match state.mailer.send(&message).await {
        Ok(outcome) => cham_api_response(
            StatusCode::ACCEPTED,
            ContactResponse {
                ok: true,
                delivered: outcome == MailOutcome::Sent,
            },
        ),
        Err(e) => {
            error!("couldn't forward contact message: {e}");
            cham_api_err_details(StatusCode::BAD_GATEWAY, "Failed to deliver message", e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cham::{
        api::test_support::{body_json, post_json, send},
        backend::MemoryBackend,
        mailer::test_support::webhook,
        router::router,
        state::test_support::{state, state_with_webhook},
    };
    use serde_json::json;
    use std::{path::PathBuf, sync::Arc};

    fn request(name: &str, email: &str, message: &str) -> ContactRequest {
        ContactRequest {
            name: name.to_string(),
            email: email.to_string(),
            message: message.to_string(),
        }
    }

    #[test]
    fn every_field_is_required() {
        assert_eq!(
            request(" ", "a@b.c", "hi").validate().unwrap_err(),
            ContactError::MissingName
        );
        assert_eq!(
            request("Rami", "nope", "hi").validate().unwrap_err(),
            ContactError::InvalidEmail
        );
        assert_eq!(
            request("Rami", "a@b.c", "  ").validate().unwrap_err(),
            ContactError::MissingMessage
        );
    }

    #[test]
    fn message_length_is_counted_in_characters() {
        let arabic = "ش".repeat(MAX_MESSAGE_CHARS);
        assert!(request("Rami", "a@b.c", &arabic).validate().is_ok());
        let too_long = "a".repeat(MAX_MESSAGE_CHARS + 1);
        assert_eq!(
            request("Rami", "a@b.c", &too_long).validate().unwrap_err(),
            ContactError::MessageTooLong
        );
    }

    #[tokio::test]
    async fn accepted_without_mail_webhook() {
        let app = router(state(Arc::new(MemoryBackend::new())), PathBuf::from("static"));
        let response = send(
            &app,
            post_json(
                "/api/contact",
                json!({"name": "Rami", "email": "Rami@Example.org", "message": "مرحبا"}),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(
            body_json(response).await,
            json!({"ok": true, "delivered": false})
        );
    }

    #[tokio::test]
    async fn invalid_message_is_rejected() {
        let app = router(state(Arc::new(MemoryBackend::new())), PathBuf::from("static"));
        let response = send(&app, post_json("/api/contact", json!({"name": "Rami"}))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "البريد الإلكتروني غير صحيح");
    }

    #[tokio::test]
    async fn delivered_through_the_webhook() {
        let (url, inbox) = webhook(StatusCode::OK).await;
        let app = router(
            state_with_webhook(Arc::new(MemoryBackend::new()), url),
            PathBuf::from("static"),
        );
        let response = send(
            &app,
            post_json(
                "/api/contact",
                json!({"name": "Rami", "email": "rami@example.org", "message": "مرحبا"}),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(body_json(response).await["delivered"], true);

        let inbox = inbox.lock().await;
        assert_eq!(inbox[0]["to"], json!(["board@cham.test"]));
        assert!(inbox[0]["text"].as_str().unwrap().contains("rami@example.org"));
    }

    #[tokio::test]
    async fn webhook_failure_is_a_bad_gateway() {
        let (url, _) = webhook(StatusCode::INTERNAL_SERVER_ERROR).await;
        let app = router(
            state_with_webhook(Arc::new(MemoryBackend::new()), url),
            PathBuf::from("static"),
        );
        let response = send(
            &app,
            post_json(
                "/api/contact",
                json!({"name": "Rami", "email": "rami@example.org", "message": "مرحبا"}),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = body_json(response).await;
        assert_eq!(body["ok"], false);
        assert_eq!(body["error"], "Failed to deliver message");
        assert!(body["details"].as_str().unwrap().contains("500"));
    }
}
