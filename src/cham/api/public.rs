use super::{
    super::{
        ChamResult,
        content::{self, EventSplit},
        countries::{self, COUNTRIES, Country},
        state::AppState,
    },
    cham_api_response,
};
use crate::APP_START;
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Local;
use humantime::format_duration;
use serde::Serialize;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::{fs::File, io::AsyncReadExt};
#[allow(unused_imports)]
use tracing::{debug, error, info};

pub mod contact;
pub mod donations;

pub use contact::post_contact;
pub use donations::post_donation;

#[derive(Serialize)]
struct ServerInfo {
    name: String,
    version: String,
    description: String,
    license: String,
    server_uptime: String,
    system_uptime: String,
}

#[derive(Serialize)]
struct UptimeResponse {
    app_uptime: String,
    system_uptime: String,
}

#[derive(Serialize)]
struct CountryEntry {
    #[serde(flatten)]
    country: &'static Country,
    flag: String,
}

impl From<&'static Country> for CountryEntry {
    fn from(country: &'static Country) -> Self {
        Self {
            country,
            flag: countries::flag_emoji(country.iso2),
        }
    }
}

#[derive(Serialize)]
struct CountriesResponse {
    default_country: &'static str,
    default_dial: &'static str,
    countries: Vec<CountryEntry>,
}

async fn get_app_uptime() -> ChamResult<Duration> {
    Ok(Duration::from_secs(
        SystemTime::now()
            .duration_since(UNIX_EPOCH)?
            .as_secs()
            .saturating_sub(*APP_START),
    ))
}

async fn get_system_uptime() -> ChamResult<Duration> {
    let mut contents = String::new();
    let mut file = File::open("/proc/uptime").await?;

    file.read_to_string(&mut contents).await?;

    let uptime: f64 = contents
        .split_whitespace()
        .next()
        .ok_or("No data in /proc/uptime")?
        .parse()?;

    if !uptime.is_finite() || uptime < 0.0 {
        return Err("Uptime is out of range".into());
    }

    Ok(Duration::from_secs_f64(uptime))
}

async fn uptimes() -> (Duration, Duration) {
    let app_uptime = get_app_uptime().await.unwrap_or_else(|e| {
        error!("Error getting app uptime: {}", e);
        Duration::new(0, 0)
    });

    let system_uptime = get_system_uptime().await.unwrap_or_else(|e| {
        error!("Error getting system uptime: {}", e);
        Duration::new(0, 0)
    });

    (app_uptime, system_uptime)
}

pub async fn get_server_info() -> impl IntoResponse {
    let (app_uptime, system_uptime) = uptimes().await;

    cham_api_response(
        StatusCode::OK,
        ServerInfo {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            description: env!("CARGO_PKG_DESCRIPTION").to_string(),
            license: env!("CARGO_PKG_LICENSE").to_string(),
            server_uptime: format_duration(app_uptime).to_string(),
            system_uptime: format_duration(system_uptime).to_string(),
        },
    )
}

pub async fn get_uptime() -> impl IntoResponse {
    let (app_uptime, system_uptime) = uptimes().await;

    cham_api_response(
        StatusCode::OK,
        UptimeResponse {
            app_uptime: format_duration(app_uptime).to_string(),
            system_uptime: format_duration(system_uptime).to_string(),
        },
    )
}

pub async fn get_countries() -> impl IntoResponse {
    cham_api_response(
        StatusCode::OK,
        CountriesResponse {
            default_country: countries::DEFAULT_COUNTRY_ISO2,
            default_dial: countries::DEFAULT_DIAL,
            countries: COUNTRIES.iter().map(CountryEntry::from).collect(),
        },
    )
}

pub async fn get_dial_codes() -> impl IntoResponse {
    let dials = countries::unique_dial_countries()
        .into_iter()
        .map(CountryEntry::from)
        .collect::<Vec<_>>();

    cham_api_response(StatusCode::OK, dials)
}

pub async fn get_news(State(state): State<AppState>) -> impl IntoResponse {
    cham_api_response(StatusCode::OK, content::fetch_news(state.backend.as_ref()).await)
}

pub async fn get_events(State(state): State<AppState>) -> impl IntoResponse {
    let split: EventSplit =
        content::fetch_events(state.backend.as_ref(), Local::now().date_naive()).await;
    cham_api_response(StatusCode::OK, split)
}
