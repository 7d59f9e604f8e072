//! Date-bucket, status and free-text predicates over listed leads.

use chrono::{DateTime, Duration, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde::Deserialize;

use super::domain::{Lead, LeadStatus};
use crate::error::LeadflowError;

/// Calendar buckets anchored at local midnight rather than rolling windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateRange {
    Today,
    Yesterday,
    Last7Days,
    Last30Days,
    #[default]
    All,
}

impl DateRange {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "today" => Some(Self::Today),
            "yesterday" => Some(Self::Yesterday),
            "last7days" => Some(Self::Last7Days),
            "last30days" => Some(Self::Last30Days),
            "all" | "" => Some(Self::All),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Today => "today",
            Self::Yesterday => "yesterday",
            Self::Last7Days => "last7days",
            Self::Last30Days => "last30days",
            Self::All => "all",
        }
    }

    /// Half-open `[start, end)` bounds in UTC for the bucket containing `now`.
    pub fn bounds<Tz: TimeZone>(
        &self,
        now: &DateTime<Tz>,
    ) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
        match self {
            Self::Today => (Some(local_midnight(now, 0)), None),
            Self::Yesterday => (Some(local_midnight(now, 1)), Some(local_midnight(now, 0))),
            Self::Last7Days => (Some(local_midnight(now, 6)), None),
            Self::Last30Days => (Some(local_midnight(now, 29)), None),
            Self::All => (None, None),
        }
    }

    pub fn contains<Tz: TimeZone>(&self, instant: DateTime<Utc>, now: &DateTime<Tz>) -> bool {
        let (start, end) = self.bounds(now);
        start.map_or(true, |start| instant >= start) && end.map_or(true, |end| instant < end)
    }
}

/// Midnight of the local calendar day `days_back` days before `now`.
fn local_midnight<Tz: TimeZone>(now: &DateTime<Tz>, days_back: i64) -> DateTime<Utc> {
    let day = now.date_naive() - Duration::days(days_back);
    let zone = now.timezone();
    first_instant_from(day.and_time(NaiveTime::MIN), |local| {
        zone.from_local_datetime(&local)
            .earliest()
            .map(|instant| instant.with_timezone(&Utc))
    })
}

/// Earliest instant whose local reading is at or after `local`. When `local`
/// falls in a DST gap this is the transition itself: the last valid reading
/// before the gap plus the wall-clock distance to `local`.
fn first_instant_from(
    local: NaiveDateTime,
    resolve: impl Fn(NaiveDateTime) -> Option<DateTime<Utc>>,
) -> DateTime<Utc> {
    if let Some(instant) = resolve(local) {
        return instant;
    }
    (1..=24 * 4)
        .map(|quarters| Duration::minutes(15 * quarters))
        .find_map(|back| resolve(local - back).map(|before| before + back))
        .unwrap_or_else(|| Utc.from_utc_datetime(&local))
}

/// Raw query parameters accepted by the list and export endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LeadQuery {
    #[serde(default)]
    pub range: Option<String>,
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Validated filter; every populated criterion must match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeadFilter {
    pub range: DateRange,
    pub query: Option<String>,
    pub status: Option<LeadStatus>,
}

impl LeadFilter {
    pub fn from_query(query: &LeadQuery) -> Result<Self, LeadflowError> {
        let range = match query.range.as_deref() {
            Some(raw) => DateRange::parse(raw)
                .ok_or_else(|| LeadflowError::Validation(format!("Unknown date range '{raw}'")))?,
            None => DateRange::All,
        };

        let status = match query.status.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) if raw.eq_ignore_ascii_case("all") => None,
            Some(raw) => Some(
                LeadStatus::parse(raw)
                    .ok_or_else(|| LeadflowError::Validation(format!("Unknown status '{raw}'")))?,
            ),
        };

        let search = query
            .q
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_lowercase);

        Ok(Self {
            range,
            query: search,
            status,
        })
    }

    /// Whether the date bucket or the free-text search narrows the set.
    pub fn is_narrowed(&self) -> bool {
        self.range != DateRange::All || self.query.is_some()
    }

    pub fn matches<Tz: TimeZone>(&self, lead: &Lead, now: &DateTime<Tz>) -> bool {
        if let Some(status) = self.status {
            if lead.status != status {
                return false;
            }
        }
        if !self.range.contains(lead.created_at, now) {
            return false;
        }
        match &self.query {
            Some(needle) => matches_text(lead, needle),
            None => true,
        }
    }

    pub fn apply<Tz: TimeZone>(&self, leads: Vec<Lead>, now: &DateTime<Tz>) -> Vec<Lead> {
        leads
            .into_iter()
            .filter(|lead| self.matches(lead, now))
            .collect()
    }
}

/// `needle` must already be lower-cased.
fn matches_text(lead: &Lead, needle: &str) -> bool {
    let loan = lead
        .loan_amount
        .map(|amount| amount.to_string())
        .unwrap_or_default();
    [
        lead.name.as_str(),
        lead.email.as_str(),
        lead.phone.as_str(),
        lead.city.as_str(),
        loan.as_str(),
        lead.source.as_str(),
        lead.status.as_str(),
    ]
    .iter()
    .any(|field| field.to_lowercase().contains(needle))
}
