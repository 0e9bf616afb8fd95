// libs/schedule-cell/src/services/schedule.rs
use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::{AppConfig, BookingPolicy};

use crate::models::{
    AddRecurringSlotsRequest, AddRecurringSlotsResponse, BlockDateRequest, BlockedDate,
    CreateScheduleRequest, DaySlot, DayOfWeek, DoctorSchedule, ExceptionAction,
    RecurringException, SchedulePatch, ScheduleError, SlotRange, UpdateScheduleRequest,
    WeeklySchedule,
};
use crate::repo::{PostgrestScheduleRepo, ScheduleRepo};
use crate::services::slots::compute_day_slots;

pub struct ScheduleService {
    repo: Arc<dyn ScheduleRepo>,
    policy: BookingPolicy,
}

impl ScheduleService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            repo: Arc::new(PostgrestScheduleRepo::new(config)),
            policy: BookingPolicy::default(),
        }
    }

    pub fn with_repo(repo: Arc<dyn ScheduleRepo>, policy: BookingPolicy) -> Self {
        Self { repo, policy }
    }

    /// Create the doctor's schedule. Fails with `AlreadyExists` if one is
    /// present; callers update instead.
    pub async fn create(
        &self,
        doctor_id: Uuid,
        request: CreateScheduleRequest,
        auth_token: &str,
    ) -> Result<DoctorSchedule, ScheduleError> {
        info!("Creating schedule for doctor {}", doctor_id);

        validate_weekly_schedule(&request.weekly_schedule)?;

        if self.repo.fetch(doctor_id, auth_token).await?.is_some() {
            return Err(ScheduleError::AlreadyExists);
        }

        let now = Utc::now();
        let schedule = DoctorSchedule {
            doctor_id,
            weekly_schedule: request.weekly_schedule,
            default_slot_duration_minutes: request
                .default_slot_duration_minutes
                .unwrap_or(self.policy.default_slot_duration_minutes),
            buffer_minutes: request
                .buffer_minutes
                .unwrap_or(self.policy.default_buffer_minutes),
            blocked_dates: vec![],
            recurring_exceptions: vec![],
            is_active: request.is_active.unwrap_or(true),
            created_at: now,
            updated_at: now,
        };

        if schedule.default_slot_duration_minutes <= 0 {
            return Err(ScheduleError::ValidationError(
                "Slot duration must be positive".to_string(),
            ));
        }
        if schedule.buffer_minutes < 0 {
            return Err(ScheduleError::ValidationError(
                "Buffer time cannot be negative".to_string(),
            ));
        }

        self.repo.insert(schedule, auth_token).await
    }

    pub async fn get(
        &self,
        doctor_id: Uuid,
        auth_token: &str,
    ) -> Result<DoctorSchedule, ScheduleError> {
        self.repo
            .fetch(doctor_id, auth_token)
            .await?
            .ok_or(ScheduleError::NotFound)
    }

    /// Per-field merge of the template parameters.
    pub async fn update(
        &self,
        doctor_id: Uuid,
        request: UpdateScheduleRequest,
        auth_token: &str,
    ) -> Result<DoctorSchedule, ScheduleError> {
        debug!("Updating schedule for doctor {}", doctor_id);

        if let Some(weekly) = &request.weekly_schedule {
            validate_weekly_schedule(weekly)?;
        }
        if matches!(request.default_slot_duration_minutes, Some(d) if d <= 0) {
            return Err(ScheduleError::ValidationError(
                "Slot duration must be positive".to_string(),
            ));
        }
        if matches!(request.buffer_minutes, Some(b) if b < 0) {
            return Err(ScheduleError::ValidationError(
                "Buffer time cannot be negative".to_string(),
            ));
        }

        let patch = SchedulePatch {
            weekly_schedule: request.weekly_schedule,
            default_slot_duration_minutes: request.default_slot_duration_minutes,
            buffer_minutes: request.buffer_minutes,
            is_active: request.is_active,
            updated_at: Some(Utc::now()),
            ..SchedulePatch::default()
        };

        self.repo.update_fields(doctor_id, patch, auth_token).await
    }

    /// Block a date, fully or partially. Blocking an already-blocked date
    /// replaces the entry (reason update), it does not error.
    pub async fn block_date(
        &self,
        doctor_id: Uuid,
        request: BlockDateRequest,
        auth_token: &str,
    ) -> Result<DoctorSchedule, ScheduleError> {
        if request.reason.trim().is_empty() {
            return Err(ScheduleError::ValidationError(
                "Blocking a date requires a reason".to_string(),
            ));
        }
        if let Some(windows) = &request.slots {
            for window in windows {
                if window.start_time >= window.end_time {
                    return Err(ScheduleError::ValidationError(
                        "Blocked window start must be before its end".to_string(),
                    ));
                }
            }
        }

        let schedule = self.get(doctor_id, auth_token).await?;

        let mut blocked_dates = schedule.blocked_dates;
        blocked_dates.retain(|b| b.date != request.date);
        blocked_dates.push(BlockedDate {
            date: request.date,
            reason: request.reason,
            slots: request.slots,
        });

        info!("Blocking {} for doctor {}", request.date, doctor_id);

        self.repo
            .update_fields(
                doctor_id,
                SchedulePatch {
                    blocked_dates: Some(blocked_dates),
                    updated_at: Some(Utc::now()),
                    ..SchedulePatch::default()
                },
                auth_token,
            )
            .await
    }

    /// Remove a date block. Unblocking a date that is not blocked is a
    /// no-op, not an error.
    pub async fn unblock_date(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<DoctorSchedule, ScheduleError> {
        let schedule = self.get(doctor_id, auth_token).await?;

        if schedule.blocked_entry(date).is_none() {
            debug!("Unblock of {} for doctor {} is a no-op", date, doctor_id);
            return Ok(schedule);
        }

        let mut blocked_dates = schedule.blocked_dates;
        blocked_dates.retain(|b| b.date != date);

        self.repo
            .update_fields(
                doctor_id,
                SchedulePatch {
                    blocked_dates: Some(blocked_dates),
                    updated_at: Some(Utc::now()),
                    ..SchedulePatch::default()
                },
                auth_token,
            )
            .await
    }

    /// Insert a recurring range across weekdays. Days whose template (or
    /// earlier additions) overlap the range are rejected, or skipped when
    /// the request opts into `skip_overlapping_days`; the response reports
    /// both sets.
    pub async fn add_recurring_slots(
        &self,
        doctor_id: Uuid,
        request: AddRecurringSlotsRequest,
        auth_token: &str,
    ) -> Result<AddRecurringSlotsResponse, ScheduleError> {
        if request.start_time >= request.end_time {
            return Err(ScheduleError::ValidationError(
                "Start time must be before end time".to_string(),
            ));
        }
        if request.days.is_empty() {
            return Err(ScheduleError::ValidationError(
                "At least one day is required".to_string(),
            ));
        }

        let schedule = self.get(doctor_id, auth_token).await?;

        let candidate = SlotRange {
            start_time: request.start_time,
            end_time: request.end_time,
            max_patients_per_slot: request
                .max_patients_per_slot
                .unwrap_or(self.policy.default_max_patients_per_slot),
        };

        let mut applied = Vec::new();
        let mut skipped = Vec::new();
        for &day in &request.days {
            if self.day_overlaps(&schedule, day, &candidate) {
                skipped.push(day);
            } else {
                applied.push(day);
            }
        }

        if !skipped.is_empty() && !request.skip_overlapping_days {
            warn!(
                "Recurring range {}-{} overlaps template for doctor {} on {:?}",
                request.start_time, request.end_time, doctor_id, skipped
            );
            return Err(ScheduleError::OverlappingRange { days: skipped });
        }

        if !applied.is_empty() {
            let mut exceptions = schedule.recurring_exceptions;
            exceptions.push(RecurringException {
                id: Uuid::new_v4(),
                action: ExceptionAction::Add,
                start_time: request.start_time,
                end_time: request.end_time,
                days: applied.clone(),
                max_patients_per_slot: candidate.max_patients_per_slot,
            });

            self.repo
                .update_fields(
                    doctor_id,
                    SchedulePatch {
                        recurring_exceptions: Some(exceptions),
                        updated_at: Some(Utc::now()),
                        ..SchedulePatch::default()
                    },
                    auth_token,
                )
                .await?;
        }

        Ok(AddRecurringSlotsResponse { applied, skipped })
    }

    /// Delete the schedule. Irreversible.
    pub async fn delete(&self, doctor_id: Uuid, auth_token: &str) -> Result<(), ScheduleError> {
        // Surfacing NotFound here keeps delete from silently "succeeding"
        // against a doctor that never had a schedule.
        self.get(doctor_id, auth_token).await?;
        info!("Deleting schedule for doctor {}", doctor_id);
        self.repo.delete(doctor_id, auth_token).await
    }

    /// Bookable slots for a date. A doctor without a schedule has no
    /// slots; that is an empty list, not an error.
    pub async fn available_slots(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<Vec<DaySlot>, ScheduleError> {
        let Some(schedule) = self.repo.fetch(doctor_id, auth_token).await? else {
            return Ok(vec![]);
        };

        let claims = self.repo.slot_claims(doctor_id, date, auth_token).await?;
        Ok(compute_day_slots(&schedule, date, &claims, Utc::now()))
    }

    fn day_overlaps(&self, schedule: &DoctorSchedule, day: DayOfWeek, candidate: &SlotRange) -> bool {
        let base_overlap = schedule
            .weekly_schedule
            .get(&day)
            .map(|ranges| ranges.iter().any(|r| r.overlaps(candidate)))
            .unwrap_or(false);
        if base_overlap {
            return true;
        }
        schedule.recurring_exceptions.iter().any(|exception| {
            exception.action == ExceptionAction::Add
                && exception.days.contains(&day)
                && candidate.start_time < exception.end_time
                && exception.start_time < candidate.end_time
        })
    }
}

fn validate_weekly_schedule(weekly: &WeeklySchedule) -> Result<(), ScheduleError> {
    for (day, ranges) in weekly {
        for range in ranges {
            if range.start_time >= range.end_time {
                return Err(ScheduleError::ValidationError(format!(
                    "Range start must be before end on {}",
                    day
                )));
            }
            if range.max_patients_per_slot <= 0 {
                return Err(ScheduleError::ValidationError(format!(
                    "max_patients_per_slot must be positive on {}",
                    day
                )));
            }
        }
        for (i, a) in ranges.iter().enumerate() {
            for b in ranges.iter().skip(i + 1) {
                if a.overlaps(b) {
                    return Err(ScheduleError::ValidationError(format!(
                        "Template ranges overlap on {}",
                        day
                    )));
                }
            }
        }
    }
    Ok(())
}
