// libs/schedule-cell/src/services/slots.rs
//
// Pure slot derivation: weekly template + exceptions + existing claims →
// the bookable slots of one date. No IO happens here.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};

use shared_models::booking::SlotClaim;

use crate::models::{DaySlot, DoctorSchedule, ExceptionAction, SlotRange, TimeWindow};

/// Compute the ordered slot list for `date`.
///
/// Steps: resolve the weekday template, apply full/partial date blocks and
/// recurring exceptions, slice the remaining ranges into buffered
/// fixed-width slots, mark slots at capacity as unavailable, and drop
/// slots whose start has already passed when `date` is today (server
/// clock). A trailing remainder narrower than the slot width is dropped,
/// never offered short.
pub fn compute_day_slots(
    schedule: &DoctorSchedule,
    date: NaiveDate,
    claims: &[SlotClaim],
    now: DateTime<Utc>,
) -> Vec<DaySlot> {
    if !schedule.is_active {
        return vec![];
    }

    // Full-day block wins over everything else.
    if let Some(blocked) = schedule.blocked_entry(date) {
        if blocked.is_full_day() {
            return vec![];
        }
    }

    let day: crate::models::DayOfWeek = date.weekday().into();
    let mut ranges: Vec<SlotRange> = schedule
        .weekly_schedule
        .get(&day)
        .cloned()
        .unwrap_or_default();

    // Recurring exceptions layer over the template.
    for exception in &schedule.recurring_exceptions {
        if !exception.days.contains(&day) {
            continue;
        }
        match exception.action {
            ExceptionAction::Add => ranges.push(SlotRange {
                start_time: exception.start_time,
                end_time: exception.end_time,
                max_patients_per_slot: exception.max_patients_per_slot,
            }),
            ExceptionAction::Remove => {
                let window = TimeWindow {
                    start_time: exception.start_time,
                    end_time: exception.end_time,
                };
                ranges = subtract_window(ranges, &window);
            }
        }
    }

    // Partial block removes its windows before slicing.
    if let Some(blocked) = schedule.blocked_entry(date) {
        if let Some(windows) = &blocked.slots {
            for window in windows {
                ranges = subtract_window(ranges, window);
            }
        }
    }

    ranges.sort_by_key(|r| r.start_time);

    let duration = Duration::minutes(schedule.default_slot_duration_minutes as i64);
    let buffer = Duration::minutes(schedule.buffer_minutes as i64);

    let mut slots = Vec::new();
    for range in &ranges {
        let mut cursor = range.start_time;
        loop {
            // NaiveTime addition wraps at midnight; a wrap means the slot
            // fell off the end of the day.
            let (slot_end, wrapped) = cursor.overflowing_add_signed(duration);
            if wrapped != 0 || slot_end > range.end_time || slot_end <= cursor {
                break;
            }

            let booked = claims
                .iter()
                .filter(|c| c.appointment_time.start == cursor && c.blocks_slot(now))
                .count() as i32;

            slots.push(DaySlot {
                slot_id: format!(
                    "{}_{}-{}",
                    date,
                    cursor.format("%H:%M"),
                    slot_end.format("%H:%M")
                ),
                start_time: cursor,
                end_time: slot_end,
                max_patients_per_slot: range.max_patients_per_slot,
                available: booked < range.max_patients_per_slot,
            });

            let (next, wrapped) = cursor.overflowing_add_signed(duration + buffer);
            if wrapped != 0 || next <= cursor {
                break;
            }
            cursor = next;
        }
    }

    slots.sort_by_key(|s| s.start_time);
    let mut slots = remove_overlapping_slots(slots);

    // Today's slots that already started are gone.
    if date == now.date_naive() {
        let current_time = now.time();
        slots.retain(|slot| slot.start_time > current_time);
    }

    slots
}

/// Remove `window` from every range, keeping the surviving pieces.
fn subtract_window(ranges: Vec<SlotRange>, window: &TimeWindow) -> Vec<SlotRange> {
    let mut result = Vec::with_capacity(ranges.len());
    for range in ranges {
        if window.end_time <= range.start_time || window.start_time >= range.end_time {
            result.push(range);
            continue;
        }
        if window.start_time > range.start_time {
            result.push(SlotRange {
                start_time: range.start_time,
                end_time: window.start_time,
                max_patients_per_slot: range.max_patients_per_slot,
            });
        }
        if window.end_time < range.end_time {
            result.push(SlotRange {
                start_time: window.end_time,
                end_time: range.end_time,
                max_patients_per_slot: range.max_patients_per_slot,
            });
        }
    }
    result
}

fn remove_overlapping_slots(slots: Vec<DaySlot>) -> Vec<DaySlot> {
    let mut result: Vec<DaySlot> = Vec::with_capacity(slots.len());
    for slot in slots {
        if let Some(last) = result.last() {
            if slot.start_time < last.end_time {
                continue;
            }
        }
        result.push(slot);
    }
    result
}
