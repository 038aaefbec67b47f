//! Event history: server query filters, client-side search, dashboard stats
//! and terminal rendering.

use chrono::{DateTime, Duration, Months, NaiveDate, SecondsFormat, TimeZone, Utc};
use shared::{EventStatus, HistoryItem, HistoryQuery};
use std::fmt::Write;

/// Events fetched for the history view
pub const HISTORY_LIMIT: u32 = 50;
/// Events fetched for the dashboard
pub const DASHBOARD_LIMIT: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum DateRange {
    #[default]
    All,
    Today,
    Week,
    Month,
}

impl DateRange {
    /// Start of the range, or `None` when unbounded
    pub fn start<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        match self {
            DateRange::All => None,
            DateRange::Today => now
                .date_naive()
                .and_hms_opt(0, 0, 0)?
                .and_local_timezone(now.timezone())
                .earliest(),
            DateRange::Week => Some(now.clone() - Duration::days(7)),
            DateRange::Month => now.clone().checked_sub_months(Months::new(1)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryFilter {
    pub status: Option<EventStatus>,
    pub range: DateRange,
    pub search: Option<String>,
    pub limit: u32,
}

impl Default for HistoryFilter {
    fn default() -> Self {
        Self {
            status: None,
            range: DateRange::All,
            search: None,
            limit: HISTORY_LIMIT,
        }
    }
}

fn iso(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl HistoryFilter {
    /// Server-side part of the filter, with the date range resolved against `now`
    pub fn to_query<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> HistoryQuery {
        let (start_date, end_date) = match self.range.start(now) {
            Some(start) => (Some(iso(start.with_timezone(&Utc))), Some(iso(now.with_timezone(&Utc)))),
            None => (None, None),
        };
        HistoryQuery {
            limit: Some(self.limit),
            status: self.status,
            start_date,
            end_date,
        }
    }

    /// Case-insensitive title search, applied after the server answered
    pub fn matches(&self, item: &HistoryItem) -> bool {
        match self.search.as_deref().map(str::trim) {
            Some(term) if !term.is_empty() => item.title.to_lowercase().contains(&term.to_lowercase()),
            _ => true,
        }
    }

    pub fn apply<'a>(&self, events: &'a [HistoryItem]) -> Vec<&'a HistoryItem> {
        events.iter().filter(|e| self.matches(e)).collect()
    }
}

/// Counts shown on the dashboard for the most recent events
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DashboardStats {
    pub total: usize,
    pub published: usize,
    pub drafts: usize,
}

impl DashboardStats {
    pub fn from_events(events: &[HistoryItem]) -> Self {
        let count = |status: EventStatus| events.iter().filter(|e| e.status == status).count();
        Self {
            total: events.len(),
            published: count(EventStatus::Published),
            drafts: count(EventStatus::Draft),
        }
    }
}

/// `2026-10-01T10:00:00Z` → `2026-10-01 10:00`; other shapes pass through
pub fn format_timestamp(raw: &str) -> String {
    if let Ok(time) = DateTime::parse_from_rfc3339(raw) {
        return time.format("%Y-%m-%d %H:%M").to_string();
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.format("%Y-%m-%d").to_string();
    }
    raw.to_string()
}

fn status_badge(status: EventStatus) -> String {
    let color = match status {
        EventStatus::Published => "32",
        EventStatus::Draft => "33",
        EventStatus::Failed => "31",
    };
    format!("\x1b[{}m{:<9}\x1b[0m", color, status.as_str().to_uppercase())
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}

/// One block per event: header line, platforms and post links
pub fn render_events(events: &[&HistoryItem]) -> String {
    let mut out = String::new();
    for event in events {
        let _ = writeln!(
            out,
            "{} \x1b[1m{}\x1b[0m  \x1b[90m{}\x1b[0m",
            status_badge(event.status),
            truncate(&event.title, 48),
            event.event_id
        );

        let mut when = format!("Created {}", format_timestamp(&event.created_at));
        if let Some(published) = &event.published_at {
            let _ = write!(when, "  Published {}", format_timestamp(published));
        }
        let _ = writeln!(out, "          {}", when);

        if let Some(platforms) = event.platforms.as_ref().filter(|p| !p.is_empty()) {
            let names: Vec<&str> = platforms.iter().map(|p| p.as_str()).collect();
            let _ = writeln!(out, "          Platforms: {}", names.join(", "));
        }
        if let Some(links) = &event.links {
            for (platform, link) in links {
                let _ = writeln!(out, "          {} post: \x1b[4m{}\x1b[0m", platform, link);
            }
        }
    }
    out
}
