//! News and events, read from the backend with a built-in sample set to fall
//! back on.

use super::backend::{Backend, EventRow, NewsRow};
use chrono::NaiveDate;
use serde::Serialize;
use std::cmp::Ordering;
use tracing::warn;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EventSplit {
    pub upcoming: Vec<EventRow>,
    pub past: Vec<EventRow>,
}

fn news(title: &str, category: &str, excerpt: &str, published_at: &str) -> NewsRow {
    NewsRow {
        title: title.to_string(),
        slug: None,
        category: Some(category.to_string()),
        excerpt: Some(excerpt.to_string()),
        published_at: Some(published_at.to_string()),
    }
}

fn event(
    id: &str,
    title: &str,
    start_at: &str,
    location: &str,
    description: &str,
    status: &str,
) -> EventRow {
    EventRow {
        id: Some(id.to_string()),
        title: title.to_string(),
        slug: None,
        start_at: Some(start_at.to_string()),
        end_at: None,
        location: Some(location.to_string()),
        status: Some(status.to_string()),
        description: Some(description.to_string()),
    }
}

pub fn sample_news() -> Vec<NewsRow> {
    vec![
        news(
            "إطلاق منصة الانتساب الرقمية",
            "إعلانات",
            "تجربة انضمام سريعة مع خيارات دفع متعددة وشفافة.",
            "2024-07-10",
        ),
        news(
            "حملة دعم إنساني جديدة",
            "مبادرات",
            "جمع تبرعات لمساندة الأسر المحتاجة خلال الصيف.",
            "2024-08-02",
        ),
        news(
            "فعالية ثقافية قادمة",
            "ثقافة",
            "أمسية موسيقية مع معرض صور لتاريخ المدينة.",
            "2024-09-15",
        ),
    ]
}

pub fn sample_events() -> Vec<EventRow> {
    vec![
        event(
            "fallback-evt-1",
            "ملتقى ثقافي",
            "2024-09-20",
            "باريس",
            "جلسة حوار ومعرض صور.",
            "upcoming",
        ),
        event(
            "fallback-evt-2",
            "حفل خيري",
            "2024-10-05",
            "ليون",
            "جمع تبرعات مع فقرات فنية.",
            "upcoming",
        ),
        event(
            "fallback-evt-3",
            "أمسية أدبية",
            "2024-06-11",
            "مرسيليا",
            "قراءات شعرية وندوة.",
            "past",
        ),
    ]
}

/// Calendar day an event starts on; accepts plain dates and RFC 3339 stamps.
pub fn start_date(event: &EventRow) -> Option<NaiveDate> {
    let start = event.start_at.as_deref()?.trim();
    let day = start.get(..10)?;
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

fn is_past(event: &EventRow, today: NaiveDate) -> bool {
    match event.status.as_deref().map(str::trim) {
        Some("past") => true,
        Some("upcoming") => false,
        _ => start_date(event).is_some_and(|day| day < today),
    }
}

// Undated events sort after dated ones in both lists.
fn by_start(a: &EventRow, b: &EventRow) -> Ordering {
    match (start_date(a), start_date(b)) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

pub fn split_events(events: Vec<EventRow>, today: NaiveDate) -> EventSplit {
    let (mut past, mut upcoming): (Vec<_>, Vec<_>) =
        events.into_iter().partition(|event| is_past(event, today));

    upcoming.sort_by(by_start);
    past.sort_by(|a, b| match (start_date(a), start_date(b)) {
        (Some(a), Some(b)) => b.cmp(&a),
        _ => by_start(a, b),
    });

    EventSplit { upcoming, past }
}

pub async fn fetch_news(backend: &dyn Backend) -> Vec<NewsRow> {
    match backend.list_news().await {
        Ok(rows) if !rows.is_empty() => rows,
        Ok(_) => sample_news(),
        Err(e) => {
            warn!("couldn't load news, showing samples: {e}");
            sample_news()
        }
    }
}

pub async fn fetch_events(backend: &dyn Backend, today: NaiveDate) -> EventSplit {
    let rows = match backend.list_events().await {
        Ok(rows) if !rows.is_empty() => rows,
        Ok(_) => sample_events(),
        Err(e) => {
            warn!("couldn't load events, showing samples: {e}");
            sample_events()
        }
    };

    split_events(rows, today)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cham::backend::MemoryBackend;
    use rstest::rstest;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
    }

    fn dated(id: &str, start_at: Option<&str>, status: Option<&str>) -> EventRow {
        EventRow {
            id: Some(id.to_string()),
            title: id.to_string(),
            slug: None,
            start_at: start_at.map(str::to_string),
            end_at: None,
            location: None,
            status: status.map(str::to_string),
            description: None,
        }
    }

    fn ids(events: &[EventRow]) -> Vec<&str> {
        events.iter().filter_map(|e| e.id.as_deref()).collect()
    }

    #[rstest]
    #[case(Some("2026-10-17"), None, true)]
    #[case(Some("2026-10-18"), None, false)]
    #[case(Some("2026-10-19T18:00:00+02:00"), None, false)]
    #[case(Some("2020-01-01"), Some("upcoming"), false)]
    #[case(Some("2030-01-01"), Some("past"), true)]
    #[case(None, None, false)]
    #[case(Some("soon"), Some("cancelled"), false)]
    fn explicit_status_wins_over_date(
        #[case] start_at: Option<&str>,
        #[case] status: Option<&str>,
        #[case] past: bool,
    ) {
        assert_eq!(is_past(&dated("e", start_at, status), today()), past);
    }

    #[test]
    fn upcoming_ascend_and_past_descend() {
        let split = split_events(
            vec![
                dated("late", Some("2027-03-01"), None),
                dated("old", Some("2025-01-01"), None),
                dated("undated", None, None),
                dated("soon", Some("2026-11-01"), None),
                dated("recent", Some("2026-09-01"), None),
            ],
            today(),
        );
        assert_eq!(ids(&split.upcoming), vec!["soon", "late", "undated"]);
        assert_eq!(ids(&split.past), vec!["recent", "old"]);
    }

    #[test]
    fn samples_keep_their_labels() {
        let split = split_events(sample_events(), today());
        assert_eq!(split.upcoming.len(), 2);
        assert_eq!(split.past.len(), 1);
        assert_eq!(ids(&split.upcoming), vec!["fallback-evt-1", "fallback-evt-2"]);
    }

    #[tokio::test]
    async fn empty_or_failing_backend_falls_back_to_samples() {
        let backend = MemoryBackend::new();
        assert_eq!(fetch_news(&backend).await, sample_news());

        backend.set_unavailable(true);
        assert_eq!(fetch_news(&backend).await.len(), 3);
        let split = fetch_events(&backend, today()).await;
        assert_eq!(split.upcoming.len() + split.past.len(), 3);
    }

    #[tokio::test]
    async fn stored_rows_are_preferred() {
        let backend = MemoryBackend::with_content(
            vec![NewsRow {
                title: "خبر".to_string(),
                slug: None,
                category: None,
                excerpt: None,
                published_at: None,
            }],
            vec![dated("evt-1", Some("2026-12-01"), None)],
        );
        assert_eq!(fetch_news(&backend).await.len(), 1);
        let split = fetch_events(&backend, today()).await;
        assert_eq!(ids(&split.upcoming), vec!["evt-1"]);
        assert!(split.past.is_empty());
    }
}
