//! Labor calendar: per-date fixed/non-fixed labor rules (§3).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One date's labor rules.
///
/// Fixed days (ordinary weekdays) are salaried: `fixed_hours` is paid
/// whether used or not, with `regular_rate`/`overtime_rate` governing the
/// split once `labor_hours` exceeds `fixed_hours`. Non-fixed days (weekends,
/// holidays) pay `non_fixed_rate` for at least `minimum_hours`, but only if
/// the day is actually used for production.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum LaborDay {
    Fixed {
        fixed_hours: f64,
        regular_rate: f64,
        overtime_rate: f64,
        max_hours: f64,
    },
    NonFixed {
        non_fixed_rate: f64,
        minimum_hours: f64,
        max_hours: f64,
    },
}

impl LaborDay {
    pub fn is_fixed(&self) -> bool {
        matches!(self, LaborDay::Fixed { .. })
    }

    pub fn max_hours(&self) -> f64 {
        match self {
            LaborDay::Fixed { max_hours, .. } => *max_hours,
            LaborDay::NonFixed { max_hours, .. } => *max_hours,
        }
    }

    /// Zero-capacity default assigned to weekend/holiday dates with no
    /// explicit entry (§3: "missing weekend entries are warnings, zero
    /// capacity").
    pub fn zero_capacity_non_fixed() -> Self {
        LaborDay::NonFixed {
            non_fixed_rate: 0.0,
            minimum_hours: 0.0,
            max_hours: 0.0,
        }
    }
}

/// Date-indexed labor rules over a planning horizon.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LaborCalendar {
    days: HashMap<NaiveDate, LaborDay>,
}

impl LaborCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, date: NaiveDate, day: LaborDay) -> &mut Self {
        self.days.insert(date, day);
        self
    }

    pub fn get(&self, date: NaiveDate) -> Option<&LaborDay> {
        self.days.get(&date)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.days.contains_key(&date)
    }

    /// Whether `date` falls on a calendar weekend (used as the default
    /// criticality split when deciding warning-vs-error for a missing
    /// entry; see [`crate::error::CoreError`] callers).
    pub fn is_weekend(date: NaiveDate) -> bool {
        use chrono::Datelike;
        matches!(date.weekday(), chrono::Weekday::Sat | chrono::Weekday::Sun)
    }
}
