//! Usage-related types.
//!
//! This module contains types related to datapoint quota tracking:
//! - [`UsageState`] - The running counter for the current day
//! - [`PersistedUsage`] - What gets written to disk between runs
//! - [`UsageReport`] - Read-only figures for a usage display
//! - [`PlanTier`] - The subscription plan and its daily limit

use chrono::{DateTime, Local, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Minimum elapsed time in the window before a forecast is attempted.
const FORECAST_MIN_ELAPSED_SECS: i64 = 60;

// ============================================================================
// Usage State
// ============================================================================

/// Daily datapoint counter state.
///
/// The day boundary is checked lazily: a state whose last call happened on
/// an earlier local date keeps reporting its old total until the next
/// [`apply`](Self::apply) resets it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageState {
    /// Datapoints billed since `window_start`.
    pub count_today: u64,
    /// When the current quota window was opened.
    pub window_start: DateTime<Local>,
    /// Time of the last metered call.
    pub last_call_at: DateTime<Local>,
    /// Whether the most recent request, metered or not, succeeded.
    pub last_call_succeeded: bool,
}

impl UsageState {
    /// Creates a fresh state with an empty window opened at `now`.
    pub fn new(now: DateTime<Local>) -> Self {
        Self {
            count_today: 0,
            window_start: now,
            last_call_at: now,
            last_call_succeeded: false,
        }
    }

    /// Rebuilds a state from its persisted form without resetting it.
    pub fn from_persisted(persisted: &PersistedUsage) -> Self {
        Self {
            count_today: persisted.count,
            window_start: persisted.window_start.unwrap_or(persisted.last_call),
            last_call_at: persisted.last_call,
            last_call_succeeded: false,
        }
    }

    /// Returns the persisted form of this state.
    pub fn to_persisted(&self) -> PersistedUsage {
        PersistedUsage {
            count: self.count_today,
            last_call: self.last_call_at,
            window_start: Some(self.window_start),
        }
    }

    /// Returns true if `now` falls on a later local date than the last call.
    pub fn is_stale_at(&self, now: DateTime<Local>) -> bool {
        now.date_naive() != self.last_call_at.date_naive()
    }

    /// Bills one call of `amount` datapoints at `now`.
    ///
    /// A zero amount is billed as one. Returns true when the call opened a
    /// new quota window.
    pub fn apply(&mut self, amount: u64, now: DateTime<Local>) -> bool {
        let rolled_over = self.is_stale_at(now);
        if rolled_over {
            self.count_today = 0;
            self.window_start = now;
        }
        self.count_today = self.count_today.saturating_add(amount.max(1));
        self.last_call_at = now;
        rolled_over
    }

    /// Projects the end-of-day total from the rate observed so far.
    ///
    /// Returns 0 until the window is at least a minute old.
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn forecast_at(&self, now: DateTime<Local>) -> u64 {
        let elapsed = (now - self.window_start).num_seconds();
        if elapsed <= FORECAST_MIN_ELAPSED_SECS {
            return 0;
        }

        let end_of_day = NaiveTime::from_hms_opt(23, 59, 59)
            .map(|t| now.date_naive().and_time(t))
            .unwrap_or_else(|| now.naive_local());
        let secs_left = (end_of_day - now.naive_local()).num_seconds().max(0);

        let rate = self.count_today as f64 / elapsed as f64;
        (self.count_today as f64 + rate * secs_left as f64) as u64
    }
}

// ============================================================================
// Persisted Usage
// ============================================================================

/// The usage counter as it is written to durable storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedUsage {
    /// Datapoints billed in the stored window.
    pub count: u64,
    /// Time of the last metered call.
    pub last_call: DateTime<Local>,
    /// When the stored window was opened (absent in older files).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_start: Option<DateTime<Local>>,
}

// ============================================================================
// Usage Report
// ============================================================================

/// Usage figures for display. Nothing here is enforced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageReport {
    /// Datapoints billed in the current window.
    pub used: u64,
    /// Daily plan limit.
    pub limit: u64,
    /// `max(0, limit - used)`.
    pub remaining: u64,
    /// Whether the last request succeeded.
    pub last_call_succeeded: bool,
    /// Time of the last metered call.
    pub last_call_at: DateTime<Local>,
    /// Projected end-of-day total, 0 when not yet meaningful.
    pub forecast: u64,
}

impl UsageReport {
    /// Builds a report from a state snapshot.
    pub fn from_state(state: &UsageState, limit: u64, now: DateTime<Local>) -> Self {
        Self {
            used: state.count_today,
            limit,
            remaining: limit.saturating_sub(state.count_today),
            last_call_succeeded: state.last_call_succeeded,
            last_call_at: state.last_call_at,
            forecast: state.forecast_at(now),
        }
    }

    /// Percentage of the daily limit consumed.
    #[allow(clippy::cast_precision_loss)]
    pub fn used_percent(&self) -> f64 {
        if self.limit == 0 {
            return 0.0;
        }
        (self.used as f64 / self.limit as f64) * 100.0
    }
}

// ============================================================================
// Plan Tier
// ============================================================================

/// Pulse API subscription plans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PlanTier {
    /// 4,800 datapoints per day.
    #[default]
    Hobbyist,
    /// 24,000 datapoints per day.
    Enthusiast,
    /// 120,000 datapoints per day.
    Professional,
}

impl PlanTier {
    /// Daily datapoint limit for this plan.
    pub fn daily_limit(self) -> u64 {
        match self {
            Self::Hobbyist => 4_800,
            Self::Enthusiast => 24_000,
            Self::Professional => 120_000,
        }
    }

    /// All plans, cheapest first.
    pub fn all() -> &'static [PlanTier] {
        &[Self::Hobbyist, Self::Enthusiast, Self::Professional]
    }

    /// Lowercase identifier used in settings and on the command line.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hobbyist => "hobbyist",
            Self::Enthusiast => "enthusiast",
            Self::Professional => "professional",
        }
    }
}

impl fmt::Display for PlanTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PlanTier {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hobbyist" => Ok(Self::Hobbyist),
            "enthusiast" => Ok(Self::Enthusiast),
            "professional" => Ok(Self::Professional),
            other => Err(CoreError::UnknownPlan(other.to_string())),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
