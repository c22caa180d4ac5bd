//! SM-2 derived review scheduling.
//!
//! The conversation layer only reports whether a word was used correctly, so
//! the SuperMemo quality grade collapses to two branches:
//! - success: 1 day, then 6 days, then `interval * ease_factor`
//! - failure: back to 1 day with a lower ease factor
//!
//! A word whose interval grows past a month is considered mastered and drops
//! out of review prompts.

use chrono::{DateTime, Duration, Utc};

use crate::models::{Schedule, SrsState};

pub const DEFAULT_EASE_FACTOR: f64 = 2.5;
pub const MIN_EASE_FACTOR: f64 = 1.3;
pub const MASTERY_INTERVAL_DAYS: u32 = 30;
/// Upper bound on a review interval (about a century).
pub const MAX_INTERVAL_DAYS: u32 = 36_500;

const EASE_BONUS: f64 = 0.1;
const EASE_PENALTY: f64 = 0.2;

/// Result of scheduling one review.
#[derive(Debug, Clone, PartialEq)]
pub struct Review {
    pub state: SrsState,
    pub mastered: bool,
}

impl Review {
    pub fn into_schedule(self) -> (Schedule, bool) {
        (Schedule::Scheduled(self.state), self.mastered)
    }
}

/// Schedule for a word that has just entered the bank: due tomorrow, no
/// history yet.
pub fn initial(now: DateTime<Utc>) -> SrsState {
    SrsState {
        interval: 0,
        ease_factor: DEFAULT_EASE_FACTOR,
        repetition_count: 0,
        last_review: None,
        next_review: now + Duration::days(1),
    }
}

/// Apply one binary review outcome. Unscheduled words start from the
/// defaults of a freshly inserted word.
pub fn review(schedule: &Schedule, success: bool, now: DateTime<Utc>) -> Review {
    let (mut interval, mut ease_factor, mut repetition_count) = match schedule {
        Schedule::Unscheduled => (0, DEFAULT_EASE_FACTOR, 0),
        Schedule::Scheduled(s) => (s.interval, s.ease_factor, s.repetition_count),
    };

    if success {
        interval = match repetition_count {
            0 => 1,
            1 => 6,
            _ => grow(interval, ease_factor),
        };
        repetition_count += 1;
        ease_factor = (ease_factor + EASE_BONUS).max(MIN_EASE_FACTOR);
    } else {
        repetition_count = 0;
        interval = 1;
        ease_factor = (ease_factor - EASE_PENALTY).max(MIN_EASE_FACTOR);
    }

    Review {
        state: SrsState {
            interval,
            ease_factor,
            repetition_count,
            last_review: Some(now),
            next_review: due_after(now, interval),
        },
        mastered: interval > MASTERY_INTERVAL_DAYS,
    }
}

fn grow(interval: u32, ease_factor: f64) -> u32 {
    let next = (interval as f64 * ease_factor).round();
    next.clamp(1.0, MAX_INTERVAL_DAYS as f64) as u32
}

fn due_after(now: DateTime<Utc>, interval: u32) -> DateTime<Utc> {
    now.checked_add_signed(Duration::days(i64::from(interval)))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
