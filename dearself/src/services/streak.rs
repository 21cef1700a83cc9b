//! Writing streak
//!
//! A streak counts consecutive local calendar days with at least one entry,
//! walking back from today. No entry today means no streak. Everything here
//! is pure.

use crate::config::MIN_VISIBLE_STREAK;
use crate::services::entries::Entry;
use chrono::{DateTime, Local, NaiveDate, Utc};
use std::collections::BTreeSet;

/// Which day a streak may end on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StreakRule {
    /// Anchor on today only; a day without an entry today means no streak
    #[default]
    TodayRequired,
    /// Anchor on today, or on yesterday when nothing was written today yet
    TodayOrYesterday,
}

/// Streak over a set of days
pub fn compute_days(days: impl IntoIterator<Item = NaiveDate>, today: NaiveDate, rule: StreakRule) -> u32 {
    let days: BTreeSet<NaiveDate> = days.into_iter().collect();

    let mut cursor = if days.contains(&today) {
        today
    } else {
        match (rule, today.pred_opt()) {
            (StreakRule::TodayOrYesterday, Some(yesterday)) if days.contains(&yesterday) => yesterday,
            _ => return 0,
        }
    };

    let mut streak = 0;
    while days.contains(&cursor) {
        streak += 1;
        match cursor.pred_opt() {
            Some(previous) => cursor = previous,
            None => break,
        }
    }
    streak
}

/// Streak over entry timestamps, bucketed by local calendar day
pub fn compute(timestamps: impl IntoIterator<Item = DateTime<Utc>>, today: NaiveDate, rule: StreakRule) -> u32 {
    compute_days(
        timestamps
            .into_iter()
            .map(|ts| ts.with_timezone(&Local).date_naive()),
        today,
        rule,
    )
}

/// Current streak for a set of entries under the default rule
pub fn current_streak(entries: &[Entry]) -> u32 {
    compute(
        entries.iter().map(|e| e.timestamp),
        Local::now().date_naive(),
        StreakRule::default(),
    )
}

/// Whether a streak is long enough to show a badge
pub fn badge_visible(streak: u32) -> bool {
    streak >= MIN_VISIBLE_STREAK
}

/// How a streak moved after a change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreakChange {
    /// Became long enough to show
    Reached(u32),
    /// Grew while already visible
    Increased(u32),
    Unchanged,
}

impl StreakChange {
    pub fn between(previous: u32, current: u32) -> Self {
        if !badge_visible(current) || current <= previous {
            StreakChange::Unchanged
        } else if !badge_visible(previous) {
            StreakChange::Reached(current)
        } else {
            StreakChange::Increased(current)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
    }

    fn back(n: i64) -> NaiveDate {
        today() - Duration::days(n)
    }

    #[test]
    fn test_consecutive_days() {
        let days = [back(0), back(1), back(2)];
        assert_eq!(compute_days(days, today(), StreakRule::TodayOrYesterday), 3);
        assert_eq!(compute_days(days, today(), StreakRule::TodayRequired), 3);
    }

    #[test]
    fn test_streak_ending_yesterday() {
        let days = [back(1), back(2)];
        assert_eq!(compute_days(days, today(), StreakRule::TodayOrYesterday), 2);
        assert_eq!(compute_days(days, today(), StreakRule::TodayRequired), 0);
    }

    #[test]
    fn test_default_rule_needs_an_entry_today() {
        assert_eq!(StreakRule::default(), StreakRule::TodayRequired);
        assert_eq!(compute_days([back(1), back(2)], today(), StreakRule::default()), 0);
        assert_eq!(compute_days([back(0), back(1), back(2)], today(), StreakRule::default()), 3);
    }

    #[test]
    fn test_gap_breaks_streak() {
        assert_eq!(compute_days([back(0), back(2)], today(), StreakRule::default()), 1);
        assert_eq!(compute_days([back(2), back(3)], today(), StreakRule::default()), 0);
        assert_eq!(compute_days(Vec::<NaiveDate>::new(), today(), StreakRule::default()), 0);
    }

    #[test]
    fn test_duplicates_and_future_days_ignored() {
        let days = [back(0), back(0), back(1), today() + Duration::days(1)];
        assert_eq!(compute_days(days, today(), StreakRule::default()), 2);
    }

    #[test]
    fn test_compute_buckets_by_local_day() {
        let morning = Local.with_ymd_and_hms(2026, 10, 16, 8, 0, 0).unwrap();
        let evening = Local.with_ymd_and_hms(2026, 10, 15, 22, 30, 0).unwrap();
        let timestamps = [morning, morning + Duration::hours(3), evening].map(|t| t.with_timezone(&Utc));

        assert_eq!(compute(timestamps, today(), StreakRule::default()), 2);
    }

    #[test]
    fn test_badge_and_change() {
        assert!(!badge_visible(1));
        assert!(badge_visible(2));

        assert_eq!(StreakChange::between(1, 2), StreakChange::Reached(2));
        assert_eq!(StreakChange::between(2, 3), StreakChange::Increased(3));
        assert_eq!(StreakChange::between(3, 3), StreakChange::Unchanged);
        assert_eq!(StreakChange::between(4, 0), StreakChange::Unchanged);
        assert_eq!(StreakChange::between(0, 1), StreakChange::Unchanged);
    }
}
