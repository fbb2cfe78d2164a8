//! Derived temporal predicates.
//!
//! These functions are the single definition of "overdue" and "upcoming".
//! Entities evaluate them in memory through [`Scheduled`]; the criteria
//! translator evaluates the very same functions against stored records before
//! they are rehydrated.
use super::lifecycle::{Phase, Status};
use super::types::TimeStamp;
use chrono::TimeDelta;

pub fn is_overdue(phase: Phase, planned: TimeStamp, now: TimeStamp) -> bool {
    !phase.is_terminal() && now > planned
}

/// Planned instant inside `[now, now + window]` while still in the initial phase.
pub fn is_upcoming(phase: Phase, planned: TimeStamp, now: TimeStamp, window: TimeDelta) -> bool {
    // a window reaching past the calendar is unbounded
    phase == Phase::Initial
        && planned >= now
        && now.checked_add(window).is_none_or(|end| planned <= end)
}

pub fn days_until(planned: TimeStamp, now: TimeStamp) -> i64 {
    ceil_days(planned - now)
}

pub fn days_overdue(phase: Phase, planned: TimeStamp, now: TimeStamp) -> i64 {
    if is_overdue(phase, planned, now) {
        ceil_days(now - planned)
    } else {
        0
    }
}

// whole days truncate toward zero, which is already the ceiling for negatives
fn ceil_days(delta: TimeDelta) -> i64 {
    let days = delta.num_days();
    let remainder = delta - TimeDelta::days(days);

    if remainder > TimeDelta::zero() {
        days + 1
    } else {
        days
    }
}

/// Anything with a status and a planned instant gets the derived predicates for free.
pub trait Scheduled {
    type Status: Status;

    fn status(&self) -> Self::Status;

    fn planned_at(&self) -> TimeStamp;

    fn is_overdue_at(&self, now: TimeStamp) -> bool {
        is_overdue(self.status().phase(), self.planned_at(), now)
    }
    fn is_overdue(&self) -> bool {
        self.is_overdue_at(TimeStamp::new())
    }
    fn is_upcoming_at(&self, window: TimeDelta, now: TimeStamp) -> bool {
        is_upcoming(self.status().phase(), self.planned_at(), now, window)
    }
    fn is_upcoming(&self, window: TimeDelta) -> bool {
        self.is_upcoming_at(window, TimeStamp::new())
    }
    fn days_until_planned_at(&self, now: TimeStamp) -> i64 {
        days_until(self.planned_at(), now)
    }
    fn days_until_planned(&self) -> i64 {
        self.days_until_planned_at(TimeStamp::new())
    }
    fn days_overdue_at(&self, now: TimeStamp) -> i64 {
        days_overdue(self.status().phase(), self.planned_at(), now)
    }
    fn days_overdue(&self) -> i64 {
        self.days_overdue_at(TimeStamp::new())
    }
}
