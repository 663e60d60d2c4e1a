use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use roster_core::{AttendanceId, DomainError, DomainResult};

use crate::Period;

/// Longest accepted annual-leave note.
pub const ANNUAL_LEAVE_MAX_LEN: usize = 255;

/// One month of attendance figures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceDay {
    pub id: AttendanceId,
    pub year: i32,
    pub month: u32,
    /// Paid full-attendance days.
    pub full_attendance_day: Option<f64>,
    /// Days actually attended.
    pub real_day: Option<f64>,
    /// Contributed (extra) days.
    pub add_day: Option<f64>,
    pub annual_leave_day: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewAttendanceDay {
    pub period: Period,
    pub full_attendance_day: Option<f64>,
    pub real_day: Option<f64>,
    pub add_day: Option<f64>,
    pub annual_leave_day: Option<String>,
}

impl NewAttendanceDay {
    /// Validate counts and round them to one fractional digit.
    pub fn normalized(self) -> DomainResult<Self> {
        check_leave(self.annual_leave_day.as_deref())?;
        Ok(Self {
            period: self.period,
            full_attendance_day: day_count("full_attendance_day", self.full_attendance_day)?,
            real_day: day_count("real_day", self.real_day)?,
            add_day: day_count("add_day", self.add_day)?,
            annual_leave_day: self.annual_leave_day,
        })
    }

    pub fn into_record(self, id: AttendanceId, now: DateTime<Utc>) -> AttendanceDay {
        AttendanceDay {
            id,
            year: self.period.year(),
            month: self.period.month(),
            full_attendance_day: self.full_attendance_day,
            real_day: self.real_day,
            add_day: self.add_day,
            annual_leave_day: self.annual_leave_day,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update; `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttendanceChanges {
    pub period: Option<Period>,
    pub full_attendance_day: Option<f64>,
    pub real_day: Option<f64>,
    pub add_day: Option<f64>,
    pub annual_leave_day: Option<String>,
}

impl AttendanceChanges {
    pub fn normalized(self) -> DomainResult<Self> {
        check_leave(self.annual_leave_day.as_deref())?;
        Ok(Self {
            period: self.period,
            full_attendance_day: day_count("full_attendance_day", self.full_attendance_day)?,
            real_day: day_count("real_day", self.real_day)?,
            add_day: day_count("add_day", self.add_day)?,
            annual_leave_day: self.annual_leave_day,
        })
    }

    pub fn apply(&self, day: &mut AttendanceDay, now: DateTime<Utc>) {
        if let Some(period) = self.period {
            day.year = period.year();
            day.month = period.month();
        }
        if self.full_attendance_day.is_some() {
            day.full_attendance_day = self.full_attendance_day;
        }
        if self.real_day.is_some() {
            day.real_day = self.real_day;
        }
        if self.add_day.is_some() {
            day.add_day = self.add_day;
        }
        if let Some(leave) = &self.annual_leave_day {
            day.annual_leave_day = Some(leave.clone());
        }
        day.updated_at = now;
    }
}

fn day_count(field: &str, value: Option<f64>) -> DomainResult<Option<f64>> {
    match value {
        None => Ok(None),
        Some(v) if !v.is_finite() || v < 0.0 => Err(DomainError::validation(format!(
            "{field} must be a non-negative number"
        ))),
        Some(v) => Ok(Some((v * 10.0).round() / 10.0)),
    }
}

fn check_leave(value: Option<&str>) -> DomainResult<()> {
    match value {
        Some(v) if v.chars().count() > ANNUAL_LEAVE_MAX_LEN => Err(DomainError::validation(
            format!("annual_leave_day must be at most {ANNUAL_LEAVE_MAX_LEN} characters"),
        )),
        _ => Ok(()),
    }
}
