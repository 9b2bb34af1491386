//! Cross-report indicator trends.
//!
//! Correlates a named indicator from the latest report against same-named
//! indicators in the profile's completed history and produces the time
//! series a caller would chart. Read-only: derives a view, never mutates.

use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

use crate::models::{HistoryItem, JobStatus, ResultKind};

/// One charted point of an indicator's cross-report series.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    /// Resolved report date label (not necessarily ISO).
    pub date: String,
    pub value: f64,
    pub is_current: bool,
}

/// How indicator names are correlated across reports.
///
/// The forgiving containment mode mirrors the source system: "Glucose"
/// matches "Fasting Glucose" and vice versa. That risks false merges across
/// distinct panels, so exact matching is offered as an opt-in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NameMatch {
    #[default]
    Containment,
    Exact,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TrendOptions {
    pub name_match: NameMatch,
}

/// Build the cross-report series for one indicator of one profile.
///
/// Scans completed REPORT-type items visible to `profile_id` (legacy items
/// without an owner count for every profile), pairs each matched numeric
/// value with the item's resolved report date, dedupes by date label
/// (last scanned wins), sorts ascending by parsed date and marks the entry
/// whose date equals `current_date`.
///
/// Returns an empty series when no historical point matches; callers then
/// fall back to a single-point reference-range gauge. Merging a live,
/// not-yet-persisted value is the caller's job via [`merge_current_point`].
pub fn build_series(
    items: &[HistoryItem],
    profile_id: Uuid,
    indicator_name: &str,
    current_date: &str,
    options: TrendOptions,
) -> Vec<TrendPoint> {
    let mut by_date: Vec<(String, f64)> = Vec::new();

    for item in items {
        if item.status != JobStatus::Completed || !item.visible_to(profile_id) {
            continue;
        }
        let Some(result) = &item.result else { continue };
        if result.kind != ResultKind::Report {
            continue;
        }
        let Some(indicator) = result
            .indicators
            .iter()
            .find(|i| names_match(&i.name, indicator_name, options.name_match))
        else {
            continue;
        };
        let Some(value) = indicator.numeric_value() else {
            continue;
        };

        let date = item.resolved_date();
        match by_date.iter_mut().find(|(d, _)| *d == date) {
            Some(slot) => slot.1 = value,
            None => by_date.push((date, value)),
        }
    }

    let mut points: Vec<TrendPoint> = by_date
        .into_iter()
        .map(|(date, value)| TrendPoint {
            is_current: date == current_date,
            date,
            value,
        })
        .collect();
    sort_by_date(&mut points);
    points
}

/// Splice the live current value into a series if its date is not already
/// represented, re-sort, and ensure the current entry is marked.
pub fn merge_current_point(
    mut series: Vec<TrendPoint>,
    current_value: f64,
    current_date: &str,
) -> Vec<TrendPoint> {
    match series.iter_mut().find(|p| p.date == current_date) {
        Some(existing) => existing.is_current = true,
        None => series.push(TrendPoint {
            date: current_date.to_string(),
            value: current_value,
            is_current: true,
        }),
    }
    sort_by_date(&mut series);
    series
}

fn names_match(candidate: &str, target: &str, mode: NameMatch) -> bool {
    match mode {
        NameMatch::Exact => candidate == target,
        NameMatch::Containment => candidate.contains(target) || target.contains(candidate),
    }
}

fn sort_by_date(points: &mut [TrendPoint]) {
    points.sort_by(|a, b| date_key(&a.date).cmp(&date_key(&b.date)));
}

/// Sort key: parsed date first, unparseable labels after, lexicographic
/// within each group.
fn date_key(label: &str) -> (u8, NaiveDate, String) {
    match parse_date_label(label) {
        Some(date) => (0, date, label.to_string()),
        None => (1, NaiveDate::MIN, label.to_string()),
    }
}

/// Parse the date formats users and documents actually produce.
pub fn parse_date_label(label: &str) -> Option<NaiveDate> {
    const FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d", "%Y年%m月%d日"];
    let trimmed = label.trim();
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
}
