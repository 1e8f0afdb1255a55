//! Time tracking value objects: rates, sessions, and recorded entries.

use super::{TaskId, TimeEntryId};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Billing rate in integer cents per hour.
///
/// Money is held in minor units throughout so that cost arithmetic stays
/// exact; rendering as a decimal amount is a presentation concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HourlyRate(u32);

impl HourlyRate {
    /// Creates a rate from cents per hour.
    #[must_use]
    pub const fn from_cents(cents_per_hour: u32) -> Self {
        Self(cents_per_hour)
    }

    /// Returns the rate in cents per hour.
    #[must_use]
    pub const fn cents_per_hour(self) -> u32 {
        self.0
    }

    /// Computes the cost in cents for a tracked duration at this rate.
    ///
    /// Rounds down to whole cents.
    #[must_use]
    #[expect(
        clippy::integer_division,
        clippy::integer_division_remainder_used,
        reason = "costs round down to whole cents; the remainder is sub-cent"
    )]
    pub const fn cost_cents(self, duration_secs: u64) -> u64 {
        duration_secs * self.0 as u64 / 3600
    }
}

impl fmt::Display for HourlyRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}c/h", self.0)
    }
}

/// An in-progress time measurement attached to a task.
///
/// At most one session exists per task at any instant. The session
/// snapshots the cumulative time and the billing rate at start so that
/// neither concurrent edits nor later rate changes can retroactively
/// alter what the session measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveTrackingSession {
    start_time: DateTime<Utc>,
    base_time_spent_ms: u64,
    hourly_rate: Option<HourlyRate>,
}

impl ActiveTrackingSession {
    /// Starts a session at the current clock time.
    #[must_use]
    pub fn begin(base_time_spent_ms: u64, hourly_rate: Option<HourlyRate>, clock: &impl Clock) -> Self {
        Self {
            start_time: clock.utc(),
            base_time_spent_ms,
            hourly_rate,
        }
    }

    /// Returns the instant the session started.
    #[must_use]
    pub const fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    /// Returns the task's cumulative tracked milliseconds at session start.
    #[must_use]
    pub const fn base_time_spent_ms(&self) -> u64 {
        self.base_time_spent_ms
    }

    /// Returns the billing rate snapshotted at session start.
    #[must_use]
    pub const fn hourly_rate(&self) -> Option<HourlyRate> {
        self.hourly_rate
    }

    /// Milliseconds measured by this session as of `now`.
    ///
    /// Clocks that have gone backwards yield zero rather than a negative
    /// duration.
    #[must_use]
    pub fn elapsed_session_ms(&self, now: DateTime<Utc>) -> u64 {
        u64::try_from((now - self.start_time).num_milliseconds()).unwrap_or(0)
    }

    /// Cumulative display value: base time plus session time.
    #[must_use]
    pub fn elapsed_total_ms(&self, now: DateTime<Utc>) -> u64 {
        self.base_time_spent_ms
            .saturating_add(self.elapsed_session_ms(now))
    }
}

/// A completed, billable time measurement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeEntry {
    id: TimeEntryId,
    task_id: TaskId,
    duration_secs: u64,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    hourly_rate: Option<HourlyRate>,
    cost_cents: u64,
}

impl TimeEntry {
    /// Builds the entry produced by stopping `session` at `end_time`.
    #[must_use]
    #[expect(
        clippy::integer_division,
        clippy::integer_division_remainder_used,
        reason = "entries bill in whole seconds; sub-second remainders stay in time_spent_ms"
    )]
    pub fn from_session(
        task_id: TaskId,
        session: &ActiveTrackingSession,
        end_time: DateTime<Utc>,
    ) -> Self {
        let duration_secs = session.elapsed_session_ms(end_time) / 1000;
        let cost_cents = session
            .hourly_rate()
            .map_or(0, |rate| rate.cost_cents(duration_secs));
        Self {
            id: TimeEntryId::new(),
            task_id,
            duration_secs,
            start_time: session.start_time(),
            end_time,
            hourly_rate: session.hourly_rate(),
            cost_cents,
        }
    }

    /// Returns the entry identifier.
    #[must_use]
    pub const fn id(&self) -> TimeEntryId {
        self.id
    }

    /// Returns the task the time was tracked against.
    #[must_use]
    pub const fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// Returns the tracked duration in whole seconds.
    #[must_use]
    pub const fn duration_secs(&self) -> u64 {
        self.duration_secs
    }

    /// Returns the instant tracking started.
    #[must_use]
    pub const fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    /// Returns the instant tracking stopped.
    #[must_use]
    pub const fn end_time(&self) -> DateTime<Utc> {
        self.end_time
    }

    /// Returns the billing rate the entry was costed at.
    #[must_use]
    pub const fn hourly_rate(&self) -> Option<HourlyRate> {
        self.hourly_rate
    }

    /// Returns the derived cost in cents.
    #[must_use]
    pub const fn cost_cents(&self) -> u64 {
        self.cost_cents
    }
}
