//! Per-minute and per-day call ceilings for a quota-limited source.
//!
//! Checking and recording are separate calls, so concurrent callers can
//! overshoot a ceiling slightly. The limit is soft.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use flint_core::QuotaReason;
use parking_lot::Mutex;
use serde::Serialize;

use crate::clock::{Clock, SystemClock};

const WINDOW_SECS: i64 = 60;

/// Outcome of a quota check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaDecision {
    Allowed,
    Denied(QuotaReason),
}

impl QuotaDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, QuotaDecision::Allowed)
    }
}

/// Point-in-time view for health reporting.
#[derive(Debug, Clone, Serialize)]
pub struct QuotaSnapshot {
    pub minute_count: usize,
    pub daily_count: u32,
    pub day: NaiveDate,
    pub per_minute_limit: usize,
    pub per_day_limit: u32,
}

#[derive(Debug)]
struct QuotaState {
    minute_window: VecDeque<DateTime<Utc>>,
    daily_count: u32,
    day_anchor: NaiveDate,
}

impl QuotaState {
    /// Reset the day counter on date change and drop timestamps older than
    /// the window.
    fn refresh(&mut self, now: DateTime<Utc>, today: NaiveDate) {
        if today != self.day_anchor {
            tracing::info!("Quota day rolled over to {}, resetting daily count", today);
            self.daily_count = 0;
            self.day_anchor = today;
        }

        let cutoff = now - chrono::Duration::seconds(WINDOW_SECS);
        while self.minute_window.front().is_some_and(|t| *t <= cutoff) {
            self.minute_window.pop_front();
        }
    }
}

#[derive(Debug)]
pub struct QuotaTracker {
    state: Mutex<QuotaState>,
    per_minute: usize,
    per_day: u32,
    clock: Arc<dyn Clock>,
}

impl QuotaTracker {
    pub fn new(per_minute: usize, per_day: u32) -> Self {
        Self::with_clock(per_minute, per_day, Arc::new(SystemClock))
    }

    pub fn with_clock(per_minute: usize, per_day: u32, clock: Arc<dyn Clock>) -> Self {
        let day_anchor = clock.today();
        Self {
            state: Mutex::new(QuotaState {
                minute_window: VecDeque::new(),
                daily_count: 0,
                day_anchor,
            }),
            per_minute,
            per_day,
            clock,
        }
    }

    pub fn can_make_request(&self) -> QuotaDecision {
        let now = self.clock.now();
        let today = self.clock.today();
        let mut state = self.state.lock();
        state.refresh(now, today);

        if state.minute_window.len() >= self.per_minute {
            QuotaDecision::Denied(QuotaReason::Minute)
        } else if state.daily_count >= self.per_day {
            QuotaDecision::Denied(QuotaReason::Daily)
        } else {
            QuotaDecision::Allowed
        }
    }

    /// Count a request that was actually dispatched.
    pub fn record_request(&self) {
        let now = self.clock.now();
        let today = self.clock.today();
        let mut state = self.state.lock();
        state.refresh(now, today);
        state.minute_window.push_back(now);
        state.daily_count += 1;
    }

    pub fn snapshot(&self) -> QuotaSnapshot {
        let now = self.clock.now();
        let today = self.clock.today();
        let mut state = self.state.lock();
        state.refresh(now, today);
        QuotaSnapshot {
            minute_count: state.minute_window.len(),
            daily_count: state.daily_count,
            day: state.day_anchor,
            per_minute_limit: self.per_minute,
            per_day_limit: self.per_day,
        }
    }
}
