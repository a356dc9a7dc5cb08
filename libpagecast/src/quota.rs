//! Daily publish quotas
//!
//! Prevents over-posting by counting successful publishes per destination for
//! the current calendar day. State is in memory only and owned by the
//! publisher; a restart starts from zero.

use chrono::NaiveDate;
use serde::Serialize;

use crate::types::Destination;

/// Per-destination daily caps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyLimits {
    pub posts: u32,
    pub stories: u32,
}

impl DailyLimits {
    pub fn for_destination(&self, destination: Destination) -> u32 {
        match destination {
            Destination::Feed => self.posts,
            Destination::Story => self.stories,
        }
    }
}

impl Default for DailyLimits {
    fn default() -> Self {
        Self {
            posts: 1,
            stories: 1,
        }
    }
}

/// Counters for one calendar day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuotaState {
    pub posts_today: u32,
    pub stories_today: u32,
    pub last_reset_date: NaiveDate,
}

/// Quota tracker
pub struct QuotaTracker {
    limits: DailyLimits,
    state: QuotaState,
}

impl QuotaTracker {
    /// Create a tracker with zeroed counters for `today`
    pub fn new(limits: DailyLimits, today: NaiveDate) -> Self {
        Self::with_state(
            limits,
            QuotaState {
                posts_today: 0,
                stories_today: 0,
                last_reset_date: today,
            },
        )
    }

    pub fn with_state(limits: DailyLimits, state: QuotaState) -> Self {
        Self { limits, state }
    }

    /// Zero the counters when `today` is past the stored date
    ///
    /// Returns true when a reset happened. An earlier date leaves the
    /// counters alone.
    pub fn reset_if_new_day(&mut self, today: NaiveDate) -> bool {
        if today > self.state.last_reset_date {
            self.state = QuotaState {
                posts_today: 0,
                stories_today: 0,
                last_reset_date: today,
            };
            return true;
        }
        false
    }

    pub fn can_post(&self, destination: Destination) -> bool {
        self.used(destination) < self.limits.for_destination(destination)
    }

    /// Count one successful publish
    pub fn record_success(&mut self, destination: Destination) {
        match destination {
            Destination::Feed => self.state.posts_today += 1,
            Destination::Story => self.state.stories_today += 1,
        }
    }

    pub fn used(&self, destination: Destination) -> u32 {
        match destination {
            Destination::Feed => self.state.posts_today,
            Destination::Story => self.state.stories_today,
        }
    }

    pub fn remaining(&self, destination: Destination) -> u32 {
        self.limits
            .for_destination(destination)
            .saturating_sub(self.used(destination))
    }

    pub fn limit(&self, destination: Destination) -> u32 {
        self.limits.for_destination(destination)
    }

    pub fn state(&self) -> QuotaState {
        self.state
    }
}
