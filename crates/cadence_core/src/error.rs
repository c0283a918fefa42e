use chrono::NaiveDateTime;
use thiserror::Error;

use crate::rule::{AnchorTarget, PeriodUnit};

/// Rejected task or rule edits. Values are never clamped silently.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("task name must not be empty")]
    EmptyName,
    #[error("period count must be at least 1, got {0}")]
    PeriodCount(u32),
    #[error("scheduled hour must be within 0..=23, got {0}")]
    ScheduledHour(u32),
    #[error("{target:?} cannot anchor a rule repeating in {unit}")]
    TargetMismatch {
        unit: PeriodUnit,
        target: AnchorTarget,
    },
    #[error("invalid anchor target: {0}")]
    InvalidTarget(String),
}

/// Failure of a single due-date computation. Each variant carries the
/// reference timestamp the computation started from; callers treat the task
/// as due at that instant (see [`ScheduleError::fallback`]).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("calendar arithmetic overflowed while scheduling from {reference}")]
    CalendarArithmetic { reference: NaiveDateTime },
    #[error("due date did not advance past {reference} after {steps} steps")]
    NonTerminating {
        reference: NaiveDateTime,
        steps: u32,
    },
}

impl ScheduleError {
    pub fn fallback(&self) -> NaiveDateTime {
        match self {
            ScheduleError::CalendarArithmetic { reference }
            | ScheduleError::NonTerminating { reference, .. } => *reference,
        }
    }
}
