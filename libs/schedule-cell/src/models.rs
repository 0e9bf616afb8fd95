// libs/schedule-cell/src/models.rs
use chrono::{DateTime, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use shared_models::booking::{time_hm, SlotTime};

// ==============================================================================
// WEEKLY TEMPLATE
// ==============================================================================

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "snake_case")]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DayOfWeek::Monday => "monday",
            DayOfWeek::Tuesday => "tuesday",
            DayOfWeek::Wednesday => "wednesday",
            DayOfWeek::Thursday => "thursday",
            DayOfWeek::Friday => "friday",
            DayOfWeek::Saturday => "saturday",
            DayOfWeek::Sunday => "sunday",
        };
        write!(f, "{}", name)
    }
}

impl From<Weekday> for DayOfWeek {
    fn from(weekday: Weekday) -> Self {
        match weekday {
            Weekday::Mon => DayOfWeek::Monday,
            Weekday::Tue => DayOfWeek::Tuesday,
            Weekday::Wed => DayOfWeek::Wednesday,
            Weekday::Thu => DayOfWeek::Thursday,
            Weekday::Fri => DayOfWeek::Friday,
            Weekday::Sat => DayOfWeek::Saturday,
            Weekday::Sun => DayOfWeek::Sunday,
        }
    }
}

/// One bookable range inside a weekday template.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SlotRange {
    #[serde(with = "time_hm")]
    pub start_time: NaiveTime,
    #[serde(with = "time_hm")]
    pub end_time: NaiveTime,
    pub max_patients_per_slot: i32,
}

impl SlotRange {
    pub fn overlaps(&self, other: &SlotRange) -> bool {
        self.start_time < other.end_time && other.start_time < self.end_time
    }
}

pub type WeeklySchedule = BTreeMap<DayOfWeek, Vec<SlotRange>>;

// ==============================================================================
// DATE EXCEPTIONS
// ==============================================================================

/// Sub-range of a day, used for partial blocks.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeWindow {
    #[serde(with = "time_hm")]
    pub start_time: NaiveTime,
    #[serde(with = "time_hm")]
    pub end_time: NaiveTime,
}

/// Calendar-date exception. Without `slots` the whole day is blocked;
/// with `slots` only the listed windows are removed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockedDate {
    pub date: NaiveDate,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slots: Option<Vec<TimeWindow>>,
}

impl BlockedDate {
    pub fn is_full_day(&self) -> bool {
        self.slots.is_none()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExceptionAction {
    Add,
    Remove,
}

/// Ad-hoc recurring change layered over the weekly template for a subset
/// of weekdays.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurringException {
    pub id: Uuid,
    pub action: ExceptionAction,
    #[serde(with = "time_hm")]
    pub start_time: NaiveTime,
    #[serde(with = "time_hm")]
    pub end_time: NaiveTime,
    pub days: Vec<DayOfWeek>,
    pub max_patients_per_slot: i32,
}

// ==============================================================================
// SCHEDULE AGGREGATE
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorSchedule {
    pub doctor_id: Uuid,
    pub weekly_schedule: WeeklySchedule,
    pub default_slot_duration_minutes: i32,
    pub buffer_minutes: i32,
    #[serde(default)]
    pub blocked_dates: Vec<BlockedDate>,
    #[serde(default)]
    pub recurring_exceptions: Vec<RecurringException>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DoctorSchedule {
    pub fn blocked_entry(&self, date: NaiveDate) -> Option<&BlockedDate> {
        self.blocked_dates.iter().find(|b| b.date == date)
    }
}

/// Per-field partial update; only present fields are written.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedulePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weekly_schedule: Option<WeeklySchedule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_slot_duration_minutes: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buffer_minutes: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked_dates: Option<Vec<BlockedDate>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recurring_exceptions: Option<Vec<RecurringException>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct CreateScheduleRequest {
    pub weekly_schedule: WeeklySchedule,
    pub default_slot_duration_minutes: Option<i32>,
    pub buffer_minutes: Option<i32>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateScheduleRequest {
    pub weekly_schedule: Option<WeeklySchedule>,
    pub default_slot_duration_minutes: Option<i32>,
    pub buffer_minutes: Option<i32>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlockDateRequest {
    pub date: NaiveDate,
    pub reason: String,
    #[serde(default)]
    pub slots: Option<Vec<TimeWindow>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UnblockDateRequest {
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddRecurringSlotsRequest {
    #[serde(with = "time_hm")]
    pub start_time: NaiveTime,
    #[serde(with = "time_hm")]
    pub end_time: NaiveTime,
    pub days: Vec<DayOfWeek>,
    pub max_patients_per_slot: Option<i32>,
    #[serde(default)]
    pub skip_overlapping_days: bool,
}

/// Reports which weekdays took the new range and which were skipped
/// because it overlapped their template.
#[derive(Debug, Clone, Serialize)]
pub struct AddRecurringSlotsResponse {
    pub applied: Vec<DayOfWeek>,
    pub skipped: Vec<DayOfWeek>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AvailableSlotsQuery {
    pub date: NaiveDate,
}

/// A generated slot for a concrete date.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DaySlot {
    pub slot_id: String,
    #[serde(with = "time_hm")]
    pub start_time: NaiveTime,
    #[serde(with = "time_hm")]
    pub end_time: NaiveTime,
    pub max_patients_per_slot: i32,
    pub available: bool,
}

impl DaySlot {
    pub fn time(&self) -> SlotTime {
        SlotTime::new(self.start_time, self.end_time)
    }
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum ScheduleError {
    #[error("Schedule not found")]
    NotFound,

    #[error("A schedule already exists for this doctor")]
    AlreadyExists,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Range overlaps the existing template on: {days:?}")]
    OverlappingRange { days: Vec<DayOfWeek> },

    #[error("Database error: {0}")]
    DatabaseError(String),
}
