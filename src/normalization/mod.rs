//! Shared normalizer helpers.
//!
//! Pure functions used by every adapter while mapping provider payloads to
//! canonical events. Nothing in here performs I/O.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

/// Indicator used for a run whose conclusion is missing or unrecognized.
pub const DEFAULT_RUN_INDICATOR: &str = "•";

/// Fixed map from run conclusion to the short indicator placed in titles.
pub const RUN_STATUS_INDICATORS: &[(&str, &str)] = &[
    ("success", "✓"),
    ("failure", "✗"),
    ("cancelled", "⊗"),
    ("skipped", "⊘"),
    ("timed_out", "⏱"),
];

/// Conclusions whose failed jobs are worth fetching.
pub const FAILED_CONCLUSIONS: &[&str] = &["failure", "timed_out", "cancelled"];

pub fn run_status_indicator(conclusion: Option<&str>) -> &'static str {
    conclusion
        .and_then(|c| {
            RUN_STATUS_INDICATORS
                .iter()
                .find(|(name, _)| *name == c)
                .map(|(_, indicator)| *indicator)
        })
        .unwrap_or(DEFAULT_RUN_INDICATOR)
}

pub fn is_failed_conclusion(conclusion: Option<&str>) -> bool {
    conclusion.is_some_and(|c| FAILED_CONCLUSIONS.contains(&c))
}

/// Whole seconds between two instants, or `None` unless both are known.
pub fn duration_seconds(
    started: Option<DateTime<Utc>>,
    finished: Option<DateTime<Utc>>,
) -> Option<i64> {
    match (started, finished) {
        (Some(start), Some(end)) => Some((end - start).num_seconds()),
        _ => None,
    }
}

/// Render a byte count as `<n>MB` below 1024 MB, else `<n>GB`, two decimals.
///
/// Unknown and zero sizes yield `None` so callers omit the field entirely.
pub fn format_size(bytes: Option<u64>) -> Option<String> {
    let bytes = bytes.filter(|b| *b > 0)?;
    let megabytes = round2(bytes as f64 / (1024.0 * 1024.0));
    if megabytes < 1024.0 {
        Some(format!("{megabytes:.2}MB"))
    } else {
        Some(format!("{:.2}GB", round2(megabytes / 1024.0)))
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// First line of `text`, cut to at most `max_chars` characters.
pub fn first_line(text: &str, max_chars: usize) -> String {
    text.lines()
        .next()
        .unwrap_or_default()
        .chars()
        .take(max_chars)
        .collect()
}

/// Leading `len` characters of an identifier such as a sha or digest.
pub fn prefix_chars(value: &str, len: usize) -> String {
    value.chars().take(len).collect()
}

/// Keep at most `cap` items.
pub fn capped<T>(items: impl IntoIterator<Item = T>, cap: usize) -> Vec<T> {
    items.into_iter().take(cap).collect()
}

/// Review outcome counts derived from a list of (reviewer, state) pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReviewSummary {
    /// Distinct reviewer logins, sorted.
    pub reviewers: Vec<String>,
    pub approved_count: u32,
    pub changes_requested_count: u32,
}

impl ReviewSummary {
    pub fn from_reviews<'a, I>(reviews: I) -> Self
    where
        I: IntoIterator<Item = (Option<&'a str>, &'a str)>,
    {
        let mut reviewers = BTreeSet::new();
        let mut summary = ReviewSummary::default();

        for (login, state) in reviews {
            if let Some(login) = login {
                reviewers.insert(login.to_string());
            }
            match state {
                "APPROVED" => summary.approved_count += 1,
                "CHANGES_REQUESTED" => summary.changes_requested_count += 1,
                _ => {}
            }
        }

        summary.reviewers = reviewers.into_iter().collect();
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn indicator_map_covers_known_conclusions() {
        assert_eq!(run_status_indicator(Some("success")), "✓");
        assert_eq!(run_status_indicator(Some("failure")), "✗");
        assert_eq!(run_status_indicator(Some("cancelled")), "⊗");
        assert_eq!(run_status_indicator(Some("skipped")), "⊘");
        assert_eq!(run_status_indicator(Some("timed_out")), "⏱");
        assert_eq!(run_status_indicator(Some("neutral")), DEFAULT_RUN_INDICATOR);
        assert_eq!(run_status_indicator(None), DEFAULT_RUN_INDICATOR);
    }

    #[test]
    fn failed_conclusions() {
        assert!(is_failed_conclusion(Some("failure")));
        assert!(is_failed_conclusion(Some("timed_out")));
        assert!(is_failed_conclusion(Some("cancelled")));
        assert!(!is_failed_conclusion(Some("success")));
        assert!(!is_failed_conclusion(None));
    }

    #[test]
    fn duration_requires_both_ends() {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 10, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 1, 1, 10, 2, 5).unwrap();
        assert_eq!(duration_seconds(Some(start), Some(end)), Some(125));
        assert_eq!(duration_seconds(Some(start), None), None);
        assert_eq!(duration_seconds(None, Some(end)), None);
    }

    #[test]
    fn size_formatting_switches_units_at_1024_mb() {
        assert_eq!(format_size(Some(1024 * 1024)), Some("1.00MB".to_string()));
        assert_eq!(
            format_size(Some(150 * 1024 * 1024 + 512 * 1024)),
            Some("150.50MB".to_string())
        );
        assert_eq!(
            format_size(Some(1536 * 1024 * 1024)),
            Some("1.50GB".to_string())
        );
    }

    #[test]
    fn size_formatting_omits_unknown_and_zero() {
        assert_eq!(format_size(None), None);
        assert_eq!(format_size(Some(0)), None);
    }

    #[test]
    fn first_line_truncates_on_char_boundaries() {
        assert_eq!(first_line("fix: thing\n\nlong body", 100), "fix: thing");
        assert_eq!(first_line("ééééé", 3), "ééé");
        assert_eq!(first_line("", 10), "");
    }

    #[test]
    fn review_summary_counts_states_and_dedups_reviewers() {
        let summary = ReviewSummary::from_reviews([
            (Some("bob"), "COMMENTED"),
            (Some("alice"), "APPROVED"),
            (Some("bob"), "APPROVED"),
            (Some("carol"), "CHANGES_REQUESTED"),
            (None, "APPROVED"),
        ]);

        assert_eq!(summary.reviewers, vec!["alice", "bob", "carol"]);
        assert_eq!(summary.approved_count, 3);
        assert_eq!(summary.changes_requested_count, 1);
    }

    #[test]
    fn capped_limits_length() {
        assert_eq!(capped(1..=30, 20).len(), 20);
        assert_eq!(capped(1..=3, 20), vec![1, 2, 3]);
    }
}
