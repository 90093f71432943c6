//! Stateless detectors that turn market snapshots into context fragments.
//!
//! Each function returns a [`TriggerContext`] holding a few named values;
//! callers merge fragments into one context before calling
//! [`TriggerManager::check`](super::TriggerManager::check). Conditions such as
//! [`ContextFlag`](super::ContextFlag) then read the boolean keys.

use chrono::NaiveDate;
use serde_json::{Value, json};

use super::TriggerContext;

/// Default absolute percentage move that counts as significant.
pub const PRICE_MOVE_THRESHOLD_PCT: f64 = 5.0;
/// Default number of days ahead within which earnings count as upcoming.
pub const EARNINGS_WINDOW_DAYS: i64 = 7;
/// Default leader/laggard spread, in percentage points, that signals rotation.
pub const SECTOR_SPREAD_THRESHOLD_PCT: f64 = 3.0;

/// Headline keywords that warrant a fresh ingestion cycle.
pub const DEFAULT_KEYWORDS: &[&str] = &[
    "earnings",
    "guidance",
    "downgrade",
    "upgrade",
    "merger",
    "acquisition",
    "lawsuit",
    "investigation",
    "recall",
    "bankruptcy",
    "layoffs",
    "dividend",
];

/// Merge `fragment` into `ctx`, overwriting existing keys.
pub fn merge(ctx: &mut TriggerContext, fragment: TriggerContext) {
    ctx.extend(fragment);
}

fn fragment(value: Value) -> TriggerContext {
    match value {
        Value::Object(map) => map,
        _ => TriggerContext::new(),
    }
}

/// `{price_change_pct, price_move_detected, direction}`.
///
/// A non-positive previous price yields a 0% change.
pub fn price_move(previous: f64, current: f64, threshold_pct: f64) -> TriggerContext {
    let change_pct = if previous > 0.0 {
        (current - previous) / previous * 100.0
    } else {
        0.0
    };
    let direction = if change_pct > 0.0 {
        "up"
    } else if change_pct < 0.0 {
        "down"
    } else {
        "flat"
    };
    fragment(json!({
        "price_change_pct": change_pct,
        "price_move_detected": change_pct.abs() >= threshold_pct,
        "direction": direction,
    }))
}

/// `{days_to_earnings, earnings_upcoming}`.
///
/// Earnings are upcoming when they fall between today and `window_days`
/// ahead, inclusive. Past dates give a negative day count.
pub fn earnings_proximity(today: NaiveDate, earnings_date: NaiveDate, window_days: i64) -> TriggerContext {
    let days = (earnings_date - today).num_days();
    fragment(json!({
        "days_to_earnings": days,
        "earnings_upcoming": (0..=window_days).contains(&days),
    }))
}

/// `{news_keyword_hits, matched_keywords, news_alert}`.
///
/// Counts every (headline, keyword) pair where the headline contains the
/// keyword, case-insensitively. `matched_keywords` lists each distinct keyword
/// once in keyword order.
pub fn news_keywords<S: AsRef<str>>(headlines: &[S], keywords: &[&str]) -> TriggerContext {
    let lowered: Vec<String> = headlines.iter().map(|h| h.as_ref().to_lowercase()).collect();
    let mut hits = 0usize;
    let mut matched = Vec::new();
    for keyword in keywords {
        let needle = keyword.to_lowercase();
        let count = lowered.iter().filter(|h| h.contains(&needle)).count();
        if count > 0 {
            hits += count;
            matched.push(*keyword);
        }
    }
    fragment(json!({
        "news_keyword_hits": hits,
        "matched_keywords": matched,
        "news_alert": hits >= 1,
    }))
}

/// `{leading_sector, lagging_sector, rotation_spread_pct, rotation_detected}`.
///
/// Returns are percentages. Ties keep the first sector listed. With no
/// sectors both names are null and no rotation is detected.
pub fn sector_rotation(sector_returns: &[(String, f64)], spread_threshold_pct: f64) -> TriggerContext {
    let mut leading: Option<&(String, f64)> = None;
    let mut lagging: Option<&(String, f64)> = None;
    for entry in sector_returns {
        if leading.is_none_or(|l| entry.1 > l.1) {
            leading = Some(entry);
        }
        if lagging.is_none_or(|l| entry.1 < l.1) {
            lagging = Some(entry);
        }
    }

    let spread = match (leading, lagging) {
        (Some(lead), Some(lag)) => lead.1 - lag.1,
        _ => 0.0,
    };
    fragment(json!({
        "leading_sector": leading.map(|l| l.0.clone()),
        "lagging_sector": lagging.map(|l| l.0.clone()),
        "rotation_spread_pct": spread,
        "rotation_detected": leading.is_some() && spread >= spread_threshold_pct,
    }))
}
