//! Server-rendered pages. Every template extends `base.html` (Arabic, RTL).

use super::{
    api::{admin::approval_link, public::donations::SUGGESTED_AMOUNTS},
    backend::{EventRow, MembershipStatus, NewsRow, PaymentRow, format_amount},
    content,
    countries::{self, COUNTRIES, DEFAULT_COUNTRY_ISO2, DEFAULT_DIAL},
    session::{self, CurrentUser},
    state::AppState,
};
use askama::Template;
use axum::{
    body::Body,
    extract::{Query, Request, State},
    http::{HeaderMap, Response, StatusCode},
    response::{Html, IntoResponse, Response as AxumResponse},
};
use axum_extra::extract::cookie::CookieJar;
use chrono::{Datelike, Local};
use serde::Deserialize;
use std::convert::Infallible;
use tracing::{error, warn};

pub struct HtmlTemplate<T>(pub T);

impl<T> IntoResponse for HtmlTemplate<T>
where
    T: Template,
{
    fn into_response(self) -> AxumResponse {
        match self.0.render() {
            Ok(html) => Html(html).into_response(),
            Err(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to render template. Error: {err}"),
            )
                .into_response(),
        }
    }
}

fn year() -> i32 {
    Local::now().year()
}

pub struct NewsCard {
    pub title: String,
    pub category: String,
    pub excerpt: String,
    pub published_at: String,
}

impl From<NewsRow> for NewsCard {
    fn from(row: NewsRow) -> Self {
        Self {
            title: row.title,
            category: row.category.unwrap_or_else(|| "تصنيف".to_string()),
            excerpt: row.excerpt.unwrap_or_default(),
            published_at: row.published_at.unwrap_or_else(|| "—".to_string()),
        }
    }
}

pub struct EventCard {
    pub id: String,
    pub title: String,
    pub date: String,
    pub location: String,
    pub description: String,
    pub registered: bool,
}

impl From<EventRow> for EventCard {
    fn from(row: EventRow) -> Self {
        let date = content::start_date(&row)
            .map(|day| day.format("%Y-%m-%d").to_string())
            .or(row.start_at)
            .unwrap_or_else(|| "—".to_string());
        Self {
            id: row.id.or(row.slug).unwrap_or_default(),
            title: row.title,
            date,
            location: row.location.unwrap_or_default(),
            description: row
                .description
                .unwrap_or_else(|| "التفاصيل قريباً".to_string()),
            registered: false,
        }
    }
}

pub struct CountryOption {
    pub iso2: &'static str,
    pub label: String,
    pub dial: &'static str,
    pub selected: bool,
}

pub struct PaymentLine {
    pub donor: String,
    pub purpose: String,
    pub amount: String,
    pub method: String,
    pub created_at: String,
    pub approve_url: String,
}

#[derive(Template)]
#[template(path = "404.html")]
struct NotFoundTemplate {
    path: String,
    year: i32,
}

#[derive(Template)]
#[template(path = "index.html")]
struct IndexTemplate {
    news: Vec<NewsCard>,
    events: Vec<EventCard>,
    year: i32,
}

#[derive(Template)]
#[template(path = "about.html")]
struct AboutTemplate {
    year: i32,
}

#[derive(Template)]
#[template(path = "mission.html")]
struct MissionTemplate {
    year: i32,
}

#[derive(Template)]
#[template(path = "vision.html")]
struct VisionTemplate {
    year: i32,
}

#[derive(Template)]
#[template(path = "news.html")]
struct NewsTemplate {
    news: Vec<NewsCard>,
    year: i32,
}

#[derive(Template)]
#[template(path = "events.html")]
struct EventsTemplate {
    upcoming: Vec<EventCard>,
    past: Vec<EventCard>,
    year: i32,
}

#[derive(Template)]
#[template(path = "membership.html")]
struct MembershipTemplate {
    open: bool,
    fee: String,
    countries: Vec<CountryOption>,
    dials: Vec<CountryOption>,
    year: i32,
}

#[derive(Template)]
#[template(path = "donate.html")]
struct DonateTemplate {
    amounts: Vec<u32>,
    year: i32,
}

#[derive(Template)]
#[template(path = "contact.html")]
struct ContactTemplate {
    year: i32,
}

#[derive(Template)]
#[template(path = "login.html")]
struct LoginTemplate {
    year: i32,
}

#[derive(Template)]
#[template(path = "auth_callback.html")]
struct AuthCallbackTemplate {
    year: i32,
}

#[derive(Template)]
#[template(path = "dashboard.html")]
struct DashboardTemplate {
    signed_in: bool,
    email: String,
    membership: String,
    expires_at: String,
    events: Vec<EventCard>,
    year: i32,
}

#[derive(Template)]
#[template(path = "admin.html")]
struct AdminTemplate {
    authorized: bool,
    payments: Vec<PaymentLine>,
    failed: bool,
    year: i32,
}

pub async fn render_404(req: Request) -> Result<Response<Body>, Infallible> {
    let not_found = NotFoundTemplate {
        path: req.uri().path().to_string(),
        year: year(),
    };
    Ok((StatusCode::NOT_FOUND, HtmlTemplate(not_found)).into_response())
}

pub async fn get_index(State(state): State<AppState>) -> impl IntoResponse {
    let news = content::fetch_news(state.backend.as_ref()).await;
    let events = content::fetch_events(state.backend.as_ref(), Local::now().date_naive()).await;

    HtmlTemplate(IndexTemplate {
        news: news.into_iter().take(3).map(NewsCard::from).collect(),
        events: events
            .upcoming
            .into_iter()
            .take(2)
            .map(EventCard::from)
            .collect(),
        year: year(),
    })
}

pub async fn get_about() -> impl IntoResponse {
    HtmlTemplate(AboutTemplate { year: year() })
}

pub async fn get_mission() -> impl IntoResponse {
    HtmlTemplate(MissionTemplate { year: year() })
}

pub async fn get_vision() -> impl IntoResponse {
    HtmlTemplate(VisionTemplate { year: year() })
}

pub async fn get_news_page(State(state): State<AppState>) -> impl IntoResponse {
    let news = content::fetch_news(state.backend.as_ref()).await;
    HtmlTemplate(NewsTemplate {
        news: news.into_iter().map(NewsCard::from).collect(),
        year: year(),
    })
}

pub async fn get_events_page(State(state): State<AppState>) -> impl IntoResponse {
    let events = content::fetch_events(state.backend.as_ref(), Local::now().date_naive()).await;
    HtmlTemplate(EventsTemplate {
        upcoming: events.upcoming.into_iter().map(EventCard::from).collect(),
        past: events.past.into_iter().map(EventCard::from).collect(),
        year: year(),
    })
}

pub async fn get_membership_page(State(state): State<AppState>) -> impl IntoResponse {
    let membership = &state.settings.membership;

    let country_options = COUNTRIES
        .iter()
        .map(|country| CountryOption {
            iso2: country.iso2,
            label: format!("{} {}", countries::flag_emoji(country.iso2), country.name),
            dial: country.dial,
            selected: country.iso2 == DEFAULT_COUNTRY_ISO2,
        })
        .collect();
    let dials = countries::unique_dial_countries()
        .into_iter()
        .map(|country| CountryOption {
            iso2: country.iso2,
            label: format!("{} {}", countries::flag_emoji(country.iso2), country.dial),
            dial: country.dial,
            selected: country.dial == DEFAULT_DIAL,
        })
        .collect();

    HtmlTemplate(MembershipTemplate {
        open: membership.submissions_open,
        fee: format_amount(membership.fee_cents, &membership.currency),
        countries: country_options,
        dials,
        year: year(),
    })
}

pub async fn get_donate() -> impl IntoResponse {
    HtmlTemplate(DonateTemplate {
        amounts: SUGGESTED_AMOUNTS.to_vec(),
        year: year(),
    })
}

pub async fn get_contact() -> impl IntoResponse {
    HtmlTemplate(ContactTemplate { year: year() })
}

pub async fn get_login() -> impl IntoResponse {
    HtmlTemplate(LoginTemplate { year: year() })
}

pub async fn get_auth_callback() -> impl IntoResponse {
    HtmlTemplate(AuthCallbackTemplate { year: year() })
}

fn membership_label(status: Option<MembershipStatus>) -> &'static str {
    match status {
        Some(MembershipStatus::Active) => "عضوية فعّالة",
        Some(MembershipStatus::Pending) => "طلب قيد المراجعة",
        None => "لا يوجد طلب انتساب",
    }
}

pub async fn get_dashboard(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> impl IntoResponse {
    let current = match session::current_user(state.backend.as_ref(), &headers, &jar).await {
        Ok(current) => current,
        Err(e) => {
            warn!("couldn't resolve dashboard session: {e}");
            None
        }
    };

    let Some(CurrentUser { user, access_token }) = current else {
        return HtmlTemplate(DashboardTemplate {
            signed_in: false,
            email: String::new(),
            membership: String::new(),
            expires_at: String::new(),
            events: Vec::new(),
            year: year(),
        });
    };

    let backend = state.backend.as_ref();
    let mut status = None;
    let mut expires_at = String::new();
    match backend.find_profile_by_user(&user.id).await {
        Ok(Some(profile)) => match backend.memberships_for_profile(&profile.id).await {
            Ok(memberships) => {
                let latest = memberships
                    .iter()
                    .find(|m| m.status == MembershipStatus::Active)
                    .or_else(|| memberships.iter().find(|m| m.is_open()));
                if let Some(membership) = latest {
                    status = Some(membership.status);
                    if let Some(expires) = membership.expires_at {
                        expires_at = expires.format("%Y-%m-%d").to_string();
                    }
                }
            }
            Err(e) => error!("couldn't load memberships for {}: {e}", user.id),
        },
        Ok(None) => {}
        Err(e) => error!("couldn't load profile for {}: {e}", user.id),
    }

    let registered = backend
        .registrations_for_user(&access_token, &user.id)
        .await
        .unwrap_or_else(|e| {
            warn!("couldn't load registrations for {}: {e}", user.id);
            Vec::new()
        });

    let events = content::fetch_events(backend, Local::now().date_naive())
        .await
        .upcoming
        .into_iter()
        .map(|row| {
            let mut card = EventCard::from(row);
            card.registered = registered
                .iter()
                .any(|registration| registration.event_id == card.id);
            card
        })
        .collect();

    HtmlTemplate(DashboardTemplate {
        signed_in: true,
        email: user.email.unwrap_or_default(),
        membership: membership_label(status).to_string(),
        expires_at,
        events,
        year: year(),
    })
}

#[derive(Debug, Default, Deserialize)]
pub struct AdminQuery {
    pub token: Option<String>,
}

fn payment_line(payment: PaymentRow, site_url: &str, token: &str) -> PaymentLine {
    let approve_url = match &payment.membership_id {
        Some(membership_id) => approval_link(site_url, token, &payment.id, membership_id),
        None => String::new(),
    };
    PaymentLine {
        donor: payment
            .donor_name
            .clone()
            .or_else(|| payment.profile_id.clone())
            .unwrap_or_else(|| "—".to_string()),
        purpose: match payment.membership_id {
            Some(_) => "انتساب".to_string(),
            None => "تبرع".to_string(),
        },
        amount: format_amount(payment.amount_cents, &payment.currency),
        method: payment.method.as_str().to_string(),
        created_at: payment
            .created_at
            .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default(),
        approve_url,
    }
}

pub async fn get_admin_page(
    State(state): State<AppState>,
    Query(query): Query<AdminQuery>,
) -> impl IntoResponse {
    let settings = &state.settings;
    let token = match query.token.as_deref() {
        Some(token) if settings.admin_token_matches(Some(token)) => token,
        _ => {
            return (
                StatusCode::UNAUTHORIZED,
                HtmlTemplate(AdminTemplate {
                    authorized: false,
                    payments: Vec::new(),
                    failed: false,
                    year: year(),
                }),
            );
        }
    };

    let (payments, failed) = match state.backend.list_pending_payments().await {
        Ok(payments) => (
            payments
                .into_iter()
                .map(|payment| payment_line(payment, &settings.site_url, token))
                .collect(),
            false,
        ),
        Err(e) => {
            error!("couldn't list pending payments: {e}");
            (Vec::new(), true)
        }
    };

    (
        StatusCode::OK,
        HtmlTemplate(AdminTemplate {
            authorized: true,
            payments,
            failed,
            year: year(),
        }),
    )
}
