use super::{
    super::{
        backend::{
            Backend, BackendError, BackendResult, MembershipStatus, NewMembership, NewPayment,
            PaymentMethod, PaymentPurpose, PaymentStatus, ProfileRow, format_amount,
        },
        mailer::MailMessage,
        membership::{Application, MembershipForm, ValidationError, validate},
        session,
        state::AppState,
    },
    admin::approval_link,
    backend_failure, cham_api_err, cham_api_response,
};
use axum::{
    body::Body,
    extract::{Multipart, State},
    http::{HeaderMap, Response, StatusCode},
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Local;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

pub const SUBMISSIONS_CLOSED: &str = "نظام الانتساب متوقف مؤقتاً لإعادة البناء.";
pub const DUPLICATE_APPLICATION: &str = "يوجد طلب انتساب سابق بهذه البيانات";
pub const ACCOUNT_EXISTS: &str = "هذا البريد مسجّل مسبقاً، سجّل الدخول ثم أعد إرسال الطلب";

#[derive(Serialize)]
struct SubmitResponse {
    ok: bool,
    profile_id: String,
    membership_id: String,
    payment_id: String,
    status: &'static str,
}

async fn has_open_membership(backend: &dyn Backend, profiles: &[ProfileRow]) -> BackendResult<bool> {
    for profile in profiles {
        let memberships = backend.memberships_for_profile(&profile.id).await?;
        if memberships.iter().any(|membership| membership.is_open()) {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Same email, or same latin name and birth date, with a pending or active
/// membership.
async fn is_duplicate(backend: &dyn Backend, application: &Application) -> BackendResult<bool> {
    let profile = &application.profile;

    let by_email = backend.find_profiles_by_email(&profile.email).await?;
    if has_open_membership(backend, &by_email).await? {
        return Ok(true);
    }

    let by_identity = backend
        .find_profiles_by_identity(
            &profile.first_name_latin,
            &profile.last_name_latin,
            profile.date_of_birth,
        )
        .await?;
    has_open_membership(backend, &by_identity).await
}

fn membership_fee(method: PaymentMethod, fee_cents: i64) -> i64 {
    match method {
        PaymentMethod::Waiver => 0,
        _ => fee_cents,
    }
}

/// POST /api/membership/submit
pub async fn post_membership_submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    multipart: Multipart,
) -> Response<Body> {
    let settings = &state.settings;
    if !settings.membership.submissions_open {
        return cham_api_err(StatusCode::SERVICE_UNAVAILABLE, SUBMISSIONS_CLOSED);
    }

    let (form, receipt) = match MembershipForm::from_multipart(multipart).await {
        Ok(parsed) => parsed,
        // Only an oversized receipt can push the body past the route limit.
        Err(e) if e.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            return cham_api_err(
                StatusCode::BAD_REQUEST,
                &ValidationError::ReceiptTooLarge.to_string(),
            );
        }
        Err(e) => return cham_api_err(e.status(), &e.body_text()),
    };

    let mut application = match validate(
        &form,
        receipt,
        Local::now().date_naive(),
        settings.membership.max_receipt_bytes,
    ) {
        Ok(application) => application,
        Err(e) => return cham_api_err(StatusCode::BAD_REQUEST, &e.to_string()),
    };

    match is_duplicate(state.backend.as_ref(), &application).await {
        Ok(false) => {}
        Ok(true) => return cham_api_err(StatusCode::CONFLICT, DUPLICATE_APPLICATION),
        Err(e) => return backend_failure("Failed to check existing memberships", &e),
    }

    let signed_in = match session::current_user(state.backend.as_ref(), &headers, &jar).await {
        Ok(current) => current,
        Err(e) => {
            warn!("ignoring unusable session on membership submit: {e}");
            None
        }
    };

    application.profile.user_id = match (signed_in, &application.password) {
        (Some(current), _) => Some(current.user.id),
        (None, Some(password)) => match state
            .backend
            .sign_up(&application.profile.email, password, &settings.auth_redirect)
            .await
        {
            Ok(user) => user.map(|user| user.id),
            Err(BackendError::Api { status, .. }) if status.is_client_error() => {
                return cham_api_err(StatusCode::CONFLICT, ACCOUNT_EXISTS);
            }
            Err(e) => return backend_failure("Failed to create account", &e),
        },
        (None, None) => None,
    };

    let profile = match state.backend.insert_profile(&application.profile).await {
        Ok(profile) => profile,
        Err(e) => return backend_failure("Failed to save profile", &e),
    };

    let receipt_path = match application.receipt.take() {
        Some(receipt) => {
            let path = format!(
                "receipts/{}/{}.{}",
                profile.id,
                Uuid::new_v4(),
                receipt.extension()
            );
            match state
                .backend
                .upload_document(&path, &receipt.content_type, receipt.bytes)
                .await
            {
                Ok(path) => Some(path),
                Err(e) => return backend_failure("Failed to upload receipt", &e),
            }
        }
        None => None,
    };

    let membership = match state
        .backend
        .insert_membership(&NewMembership {
            profile_id: profile.id.clone(),
            status: MembershipStatus::Pending,
            started_at: None,
            expires_at: None,
            receipt_path: receipt_path.clone(),
        })
        .await
    {
        Ok(membership) => membership,
        Err(e) => return backend_failure("Failed to create membership", &e),
    };

    let amount_cents = membership_fee(application.payment_method, settings.membership.fee_cents);
    let payment = match state
        .backend
        .insert_payment(&NewPayment {
            profile_id: Some(profile.id.clone()),
            membership_id: Some(membership.id.clone()),
            purpose: PaymentPurpose::Membership,
            amount_cents,
            currency: settings.membership.currency.clone(),
            method: application.payment_method,
            status: PaymentStatus::Pending,
            receipt_path,
            donor_name: None,
            donor_email: None,
            anonymous: false,
            wants_receipt: false,
        })
        .await
    {
        Ok(payment) => payment,
        Err(e) => return backend_failure("Failed to create payment", &e),
    };

    info!(
        profile = %profile.id,
        membership = %membership.id,
        payment = %payment.id,
        "membership application received"
    );

    notify(&state, &application, &membership.id, &payment.id, amount_cents).await;

    cham_api_response(
        StatusCode::CREATED,
        SubmitResponse {
            ok: true,
            profile_id: profile.id,
            membership_id: membership.id,
            payment_id: payment.id,
            status: MembershipStatus::Pending.as_str(),
        },
    )
}

// Mail failures are logged only; the application is already stored.
async fn notify(
    state: &AppState,
    application: &Application,
    membership_id: &str,
    payment_id: &str,
    amount_cents: i64,
) {
    let settings = &state.settings;
    let profile = &application.profile;
    let full_name = format!("{} {}", profile.first_name_latin, profile.last_name_latin);
    let amount = format_amount(amount_cents, &settings.membership.currency);

    if settings.admin_recipients.is_empty() {
        warn!("no admin recipients configured, application {membership_id} not announced");
    } else {
        let approval = match settings.admin_token.as_deref() {
            Some(token) => format!(
                "للموافقة على الدفعة وتفعيل العضوية:\n{}",
                approval_link(&settings.site_url, token, payment_id, membership_id)
            ),
            None => "رمز الموافقة غير مضبوط على الخادم.".to_string(),
        };
        let message = MailMessage::text(
            settings.admin_recipients.clone(),
            format!("طلب انتساب جديد: {full_name}"),
            format!(
                "الاسم: {full_name}\nالبريد: {}\nالهاتف: {}\nالمدينة: {} ({})\nوسيلة الدفع: {}\nالمبلغ: {amount}\n\n{approval}",
                profile.email,
                profile.phone,
                profile.city,
                profile.country,
                application.payment_method.as_str(),
            ),
        );
        if let Err(e) = state.mailer.send(&message).await {
            warn!("couldn't notify admins about application {membership_id}: {e}");
        }
    }

    let acknowledgement = MailMessage::text(
        vec![profile.email.clone()],
        format!("استلمنا طلب انتسابك إلى {}", settings.sender_name),
        format!(
            "مرحباً {full_name}،\n\nاستلمنا طلب انتسابك وسيتم تفعيل العضوية بعد تأكيد الدفع ({amount}).\nرقم الطلب: {membership_id}"
        ),
    );
    if let Err(e) = state.mailer.send(&acknowledgement).await {
        warn!("couldn't acknowledge application {membership_id}: {e}");
    }
}
