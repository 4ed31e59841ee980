use super::{
    api,
    pages::{self, render_404},
    state::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{
        HeaderValue, Method,
        header::{self, CACHE_CONTROL, CONTENT_SECURITY_POLICY},
    },
    routing::{get, post},
};
use axum_extra::routing::RouterExt;
use std::{path::PathBuf, time::Duration};
use tower::{ServiceBuilder, service_fn};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    services::ServeDir,
    set_header::SetResponseHeaderLayer,
};

/// Room for the text fields that travel next to the receipt.
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

const CSP: &str = "default-src 'self'; script-src 'self'; script-src-elem 'self'; style-src 'self' 'unsafe-inline'; img-src 'self' data:; connect-src 'self'; form-action 'self'; frame-ancestors 'none';";

/// Pages, API and static files. Tracing and compression are layered on in `main`.
pub fn router(state: AppState, root: PathBuf) -> Router {
    let receipt_limit = state.settings.membership.max_receipt_bytes + FORM_OVERHEAD_BYTES;

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::any())
        .allow_methods([Method::GET, Method::HEAD])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60 * 24));

    let serve_public = ServiceBuilder::new()
        .layer(SetResponseHeaderLayer::if_not_present(
            CACHE_CONTROL,
            HeaderValue::from_static("max-age=604800"),
        ))
        .service(ServeDir::new(root).not_found_service(service_fn(render_404)));

    let page_routes = Router::new()
        .route("/", get(pages::get_index))
        .route_with_tsr("/about", get(pages::get_about))
        .route_with_tsr("/mission", get(pages::get_mission))
        .route_with_tsr("/vision", get(pages::get_vision))
        .route_with_tsr("/news", get(pages::get_news_page))
        .route_with_tsr("/events", get(pages::get_events_page))
        .route_with_tsr("/membership", get(pages::get_membership_page))
        .route_with_tsr("/donate", get(pages::get_donate))
        .route_with_tsr("/contact", get(pages::get_contact))
        .route_with_tsr("/login", get(pages::get_login))
        .route_with_tsr("/auth/callback", get(pages::get_auth_callback))
        .route_with_tsr("/dashboard", get(pages::get_dashboard))
        .route_with_tsr("/admin", get(pages::get_admin_page));

    let public_api_routes = Router::new()
        .route_with_tsr("/api/info", get(api::get_server_info))
        .route_with_tsr("/api/uptime", get(api::get_uptime))
        .route_with_tsr("/api/countries", get(api::get_countries))
        .route_with_tsr("/api/countries/dial-codes", get(api::get_dial_codes))
        .route_with_tsr("/api/news", get(api::get_news))
        .route_with_tsr("/api/events", get(api::get_events))
        .layer(cors);

    let api_routes = Router::new()
        .route_with_tsr(
            "/api/membership/submit",
            post(api::post_membership_submit).layer(DefaultBodyLimit::max(receipt_limit)),
        )
        .route_with_tsr(
            "/api/admin/payments/approve",
            get(api::get_admin_approve_payment),
        )
        .route_with_tsr("/api/events/register", post(api::post_event_register))
        .route_with_tsr("/api/auth/magic-link", post(api::post_magic_link))
        .route_with_tsr("/api/auth/login", post(api::post_login))
        .route_with_tsr("/api/auth/session", post(api::post_session))
        .route_with_tsr("/api/auth/logout", post(api::post_logout))
        .route_with_tsr("/api/donations", post(api::post_donation))
        .route_with_tsr("/api/contact", post(api::post_contact));

    Router::new()
        .fallback_service(serve_public)
        .merge(
            page_routes
                .merge(public_api_routes)
                .merge(api_routes)
                .layer(SetResponseHeaderLayer::overriding(
                    CACHE_CONTROL,
                    HeaderValue::from_static("no-store"),
                )),
        )
        .layer(SetResponseHeaderLayer::if_not_present(
            CONTENT_SECURITY_POLICY,
            HeaderValue::from_static(CSP),
        ))
        .with_state(state)
}
