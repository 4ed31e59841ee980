use super::super::{
    super::{
        backend::{NewPayment, PaymentMethod, PaymentPurpose, PaymentStatus, format_amount},
        mailer::MailMessage,
        membership::validation::normalize_email,
        state::AppState,
    },
    backend_failure, cham_api_err, cham_api_response, json_body,
};
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

pub const MAX_DONATION_CENTS: i64 = 100_000 * 100;
pub const SUGGESTED_AMOUNTS: [u32; 4] = [25, 50, 100, 250];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DonationError {
    #[error("المبلغ غير صحيح")]
    InvalidAmount,
    #[error("المبلغ يتجاوز الحد المسموح")]
    AmountTooLarge,
    #[error("طريقة الدفع غير صحيحة")]
    InvalidMethod,
    #[error("الاسم مطلوب للتبرع باسمك")]
    MissingName,
    #[error("البريد الإلكتروني غير صحيح")]
    InvalidEmail,
    #[error("البريد الإلكتروني مطلوب لاستلام الإيصال")]
    MissingEmail,
}

#[derive(Debug, Deserialize)]
pub struct DonationRequest {
    #[serde(default)]
    pub amount: Value,
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub anonymous: bool,
    #[serde(default)]
    pub wants_receipt: bool,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Donation {
    pub amount_cents: i64,
    pub method: PaymentMethod,
    pub anonymous: bool,
    pub wants_receipt: bool,
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Serialize)]
struct DonationResponse {
    ok: bool,
    payment_id: String,
    amount_cents: i64,
    fees_cents: i64,
    total_cents: i64,
}

/// Euros with at most two decimals, `,` accepted as separator.
pub fn parse_amount_cents(raw: &str) -> Result<i64, DonationError> {
    let raw = raw.trim().replace(',', ".");
    let (whole, fraction) = raw.split_once('.').unwrap_or((raw.as_str(), ""));

    if whole.is_empty()
        || whole.len() > 9
        || fraction.len() > 2
        || !whole.bytes().all(|b| b.is_ascii_digit())
        || !fraction.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(DonationError::InvalidAmount);
    }

    let whole: i64 = whole.parse().map_err(|_| DonationError::InvalidAmount)?;
    let fraction: i64 = match fraction.len() {
        0 => 0,
        1 => fraction.parse::<i64>().map_err(|_| DonationError::InvalidAmount)? * 10,
        _ => fraction.parse().map_err(|_| DonationError::InvalidAmount)?,
    };

    let cents = whole * 100 + fraction;
    if cents <= 0 {
        return Err(DonationError::InvalidAmount);
    }
    if cents > MAX_DONATION_CENTS {
        return Err(DonationError::AmountTooLarge);
    }
    Ok(cents)
}

fn amount_text(amount: &Value) -> Option<String> {
    match amount {
        Value::Number(number) => Some(number.to_string()),
        Value::String(text) => Some(text.clone()),
        _ => None,
    }
}

fn parse_method(method: &str) -> Result<PaymentMethod, DonationError> {
    match method.trim() {
        "card" => Ok(PaymentMethod::Card),
        "manual" => Ok(PaymentMethod::Manual),
        "other" => Ok(PaymentMethod::Other),
        _ => Err(DonationError::InvalidMethod),
    }
}

impl DonationRequest {
    pub fn validate(self) -> Result<Donation, DonationError> {
        let amount = amount_text(&self.amount).ok_or(DonationError::InvalidAmount)?;
        let amount_cents = parse_amount_cents(&amount)?;
        let method = parse_method(&self.method)?;

        let name = self
            .name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());
        if !self.anonymous && name.is_none() {
            return Err(DonationError::MissingName);
        }

        let email = match self.email.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(email) => Some(normalize_email(email).ok_or(DonationError::InvalidEmail)?),
        };
        if self.wants_receipt && email.is_none() {
            return Err(DonationError::MissingEmail);
        }

        Ok(Donation {
            amount_cents,
            method,
            anonymous: self.anonymous,
            wants_receipt: self.wants_receipt,
            name: if self.anonymous { None } else { name },
            email,
        })
    }
}

pub async fn post_donation(State(state): State<AppState>, body: Bytes) -> impl IntoResponse {
    let request: DonationRequest = match json_body(&body) {
        Ok(request) => request,
        Err(_) => return cham_api_err(StatusCode::BAD_REQUEST, "Invalid request body"),
    };

    let donation = match request.validate() {
        Ok(donation) => donation,
        Err(e) => return cham_api_err(StatusCode::BAD_REQUEST, &e.to_string()),
    };

    let currency = state.settings.membership.currency.clone();
    let payment = match state
        .backend
        .insert_payment(&NewPayment {
            profile_id: None,
            membership_id: None,
            purpose: PaymentPurpose::Donation,
            amount_cents: donation.amount_cents,
            currency: currency.clone(),
            method: donation.method,
            status: PaymentStatus::Pending,
            receipt_path: None,
            donor_name: donation.name.clone(),
            donor_email: donation.email.clone(),
            anonymous: donation.anonymous,
            wants_receipt: donation.wants_receipt,
        })
        .await
    {
        Ok(payment) => payment,
        Err(e) => return backend_failure("Failed to record donation", &e),
    };

    info!(payment_id = %payment.id, "donation recorded");

    let amount = format_amount(donation.amount_cents, &currency);
    let donor = donation.name.as_deref().unwrap_or("متبرع مجهول");

    if !state.settings.admin_recipients.is_empty() {
        let notice = MailMessage::text(
            state.settings.admin_recipients.clone(),
            format!("تبرع جديد: {amount}"),
            format!(
                "المتبرع: {donor}\nالمبلغ: {amount}\nالطريقة: {}\nرقم الدفعة: {}",
                donation.method.as_str(),
                payment.id
            ),
        );
        if let Err(e) = state.mailer.send(&notice).await {
            warn!("couldn't notify admins about donation {}: {e}", payment.id);
        }
    }

    if let (true, Some(email)) = (donation.wants_receipt, donation.email.as_ref()) {
        let thanks = MailMessage::text(
            vec![email.clone()],
            format!("شكراً لدعمك {}", state.settings.sender_name),
            format!(
                "استلمنا تبرعك بقيمة {amount}. سنرسل لك الإيصال بعد تأكيد الدفع.\nرقم المرجع: {}",
                payment.id
            ),
        );
        if let Err(e) = state.mailer.send(&thanks).await {
            warn!("couldn't send donation receipt for {}: {e}", payment.id);
        }
    }

    cham_api_response(
        StatusCode::CREATED,
        DonationResponse {
            ok: true,
            payment_id: payment.id,
            amount_cents: donation.amount_cents,
            fees_cents: 0,
            total_cents: donation.amount_cents,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cham::{
        api::test_support::{body_json, post_json, send},
        backend::MemoryBackend,
        router::router,
        state::test_support::state,
    };
    use rstest::rstest;
    use serde_json::json;
    use std::{path::PathBuf, sync::Arc};

    #[rstest]
    #[case("25", 2500)]
    #[case("25.5", 2550)]
    #[case("25,05", 2505)]
    #[case(" 0.01 ", 1)]
    #[case("100000", 10_000_000)]
    fn amounts_in_cents(#[case] raw: &str, #[case] cents: i64) {
        assert_eq!(parse_amount_cents(raw).unwrap(), cents);
    }

    #[rstest]
    #[case("", DonationError::InvalidAmount)]
    #[case("0", DonationError::InvalidAmount)]
    #[case("0.00", DonationError::InvalidAmount)]
    #[case("-5", DonationError::InvalidAmount)]
    #[case("12.345", DonationError::InvalidAmount)]
    #[case("1e3", DonationError::InvalidAmount)]
    #[case(".5", DonationError::InvalidAmount)]
    #[case("100000.01", DonationError::AmountTooLarge)]
    fn rejected_amounts(#[case] raw: &str, #[case] expected: DonationError) {
        assert_eq!(parse_amount_cents(raw).unwrap_err(), expected);
    }

    fn request(body: Value) -> Result<Donation, DonationError> {
        serde_json::from_value::<DonationRequest>(body)
            .unwrap()
            .validate()
    }

    #[test]
    fn suggested_amounts_are_accepted() {
        for amount in SUGGESTED_AMOUNTS {
            let donation =
                request(json!({"amount": amount, "method": "card", "anonymous": true})).unwrap();
            assert_eq!(donation.amount_cents, i64::from(amount) * 100);
        }
    }

    #[test]
    fn donor_rules() {
        assert_eq!(
            request(json!({"amount": 10, "method": "card"})).unwrap_err(),
            DonationError::MissingName
        );
        assert_eq!(
            request(json!({"amount": 10, "method": "bitcoin", "anonymous": true})).unwrap_err(),
            DonationError::InvalidMethod
        );
        assert_eq!(
            request(json!({"amount": 10, "method": "card", "anonymous": true, "wants_receipt": true}))
                .unwrap_err(),
            DonationError::MissingEmail
        );
        assert_eq!(
            request(json!({"amount": 10, "method": "card", "anonymous": true, "email": "x"}))
                .unwrap_err(),
            DonationError::InvalidEmail
        );
        assert_eq!(
            request(json!({"amount": [1], "method": "card", "anonymous": true})).unwrap_err(),
            DonationError::InvalidAmount
        );

        let donation = request(json!({
            "amount": "50",
            "method": "other",
            "anonymous": true,
            "name": "Hidden",
            "wants_receipt": true,
            "email": "Donor@Example.org"
        }))
        .unwrap();
        assert!(donation.name.is_none());
        assert_eq!(donation.email.as_deref(), Some("donor@example.org"));
    }

    #[tokio::test]
    async fn donation_is_recorded_as_pending_payment() {
        let backend = Arc::new(MemoryBackend::new());
        let app = router(state(backend.clone()), PathBuf::from("static"));

        let response = send(
            &app,
            post_json(
                "/api/donations",
                json!({"amount": 50, "method": "manual", "name": "Rami"}),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert_eq!(body["ok"], true);
        assert_eq!(body["amount_cents"], 5000);
        assert_eq!(body["fees_cents"], 0);
        assert_eq!(body["total_cents"], 5000);

        let tables = backend.snapshot().await;
        assert_eq!(tables.payments.len(), 1);
        let payment = &tables.payments[0];
        assert_eq!(payment.id, body["payment_id"]);
        assert_eq!(payment.purpose, PaymentPurpose::Donation);
        assert_eq!(payment.status, PaymentStatus::Pending);
        assert_eq!(payment.donor_name.as_deref(), Some("Rami"));
    }

    #[tokio::test]
    async fn invalid_donations_are_rejected() {
        let backend = Arc::new(MemoryBackend::new());
        let app = router(state(backend.clone()), PathBuf::from("static"));

        let response = send(
            &app,
            post_json("/api/donations", json!({"amount": 0, "method": "card", "anonymous": true})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "المبلغ غير صحيح");
        assert!(backend.snapshot().await.payments.is_empty());
    }

    #[tokio::test]
    async fn backend_failure_is_reported() {
        let backend = Arc::new(MemoryBackend::new());
        backend.set_unavailable(true);
        let app = router(state(backend), PathBuf::from("static"));

        let response = send(
            &app,
            post_json("/api/donations", json!({"amount": 5, "method": "card", "anonymous": true})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Failed to record donation");
        assert_eq!(body["details"], "backend unavailable");
    }
}
