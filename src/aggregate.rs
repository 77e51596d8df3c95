use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;

use crate::store::UpdateRecord;

/// Default page size for the latest-updates view.
pub const DEFAULT_LATEST_LIMIT: usize = 5;

/// Bucket key for records missing a categorical field.
const UNKNOWN_KEY: &str = "unknown";

#[derive(Debug, Serialize)]
pub struct Latest {
    pub updates: Vec<UpdateRecord>,
    pub count: usize,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct Facets {
    pub categories: Vec<String>,
    pub providers: Vec<String>,
    pub service_types: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct Stats {
    pub total: usize,
    pub by_category: BTreeMap<String, usize>,
    pub by_provider: BTreeMap<String, usize>,
    pub by_service_type: BTreeMap<String, usize>,
    pub recent_7_days: usize,
    pub recent_30_days: usize,
}

/// Parse a record's published date. Feeds disagree on formats, so
/// RFC 3339, RFC 2822 and bare dates are all accepted.
pub fn parse_published(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date.and_hms_opt(0, 0, 0)?.and_utc());
    }
    None
}

fn published_of(record: &UpdateRecord) -> Option<DateTime<Utc>> {
    record.published_date.as_deref().and_then(parse_published)
}

/// The `limit` most recent records by published date, newest first.
/// Records with a missing or unparseable date sort as earliest.
pub fn latest(records: &[UpdateRecord], limit: usize) -> Latest {
    let total = records.len();

    let mut sorted: Vec<UpdateRecord> = records.to_vec();
    sorted.sort_by_key(|r| std::cmp::Reverse(published_of(r)));
    sorted.truncate(limit);

    Latest {
        count: sorted.len(),
        total,
        updates: sorted,
    }
}

fn distinct_values<'a>(
    records: &'a [UpdateRecord],
    field: impl Fn(&'a UpdateRecord) -> Option<&'a String>,
) -> Vec<String> {
    records
        .iter()
        .filter_map(field)
        .filter(|v| !v.is_empty())
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Distinct non-empty values observed per categorical field, each
/// list alphabetically sorted.
pub fn facets(records: &[UpdateRecord]) -> Facets {
    Facets {
        categories: distinct_values(records, |r| r.category.as_ref()),
        providers: distinct_values(records, |r| r.cloud_provider.as_ref()),
        service_types: distinct_values(records, |r| r.service_type.as_ref()),
    }
}

fn count_by<'a>(
    records: &'a [UpdateRecord],
    field: impl Fn(&'a UpdateRecord) -> Option<&'a String>,
) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for record in records {
        let key = match field(record) {
            Some(v) if !v.is_empty() => v.clone(),
            _ => UNKNOWN_KEY.to_string(),
        };
        *counts.entry(key).or_insert(0) += 1;
    }
    counts
}

/// Per-field counts plus rolling 7/30-day windows evaluated against
/// `now`. A record counts toward a window when its published date is
/// strictly after the window start.
pub fn stats(records: &[UpdateRecord], now: DateTime<Utc>) -> Stats {
    let week_ago = now - Duration::days(7);
    let month_ago = now - Duration::days(30);

    let mut recent_7_days = 0;
    let mut recent_30_days = 0;
    for record in records {
        if let Some(published) = published_of(record) {
            if published > week_ago {
                recent_7_days += 1;
            }
            if published > month_ago {
                recent_30_days += 1;
            }
        }
    }

    Stats {
        total: records.len(),
        by_category: count_by(records, |r| r.category.as_ref()),
        by_provider: count_by(records, |r| r.cloud_provider.as_ref()),
        by_service_type: count_by(records, |r| r.service_type.as_ref()),
        recent_7_days,
        recent_30_days,
    }
}
