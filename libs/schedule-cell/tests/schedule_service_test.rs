// ScheduleStore contract tests over the in-memory repository.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveTime, Utc};
use uuid::Uuid;

use schedule_cell::models::{
    AddRecurringSlotsRequest, BlockDateRequest, CreateScheduleRequest, DayOfWeek, ScheduleError,
    SlotRange, TimeWindow, UpdateScheduleRequest,
};
use schedule_cell::repo::InMemoryScheduleRepo;
use schedule_cell::services::schedule::ScheduleService;
use shared_config::policy::BookingPolicy;
use shared_models::booking::{AppointmentStatus, PaymentStatus, SlotClaim, SlotTime};

fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn service() -> (ScheduleService, Arc<InMemoryScheduleRepo>) {
    let repo = Arc::new(InMemoryScheduleRepo::new());
    (
        ScheduleService::with_repo(repo.clone(), BookingPolicy::default()),
        repo,
    )
}

fn monday_template() -> CreateScheduleRequest {
    let mut weekly = BTreeMap::new();
    weekly.insert(
        DayOfWeek::Monday,
        vec![SlotRange {
            start_time: t(9, 0),
            end_time: t(11, 0),
            max_patients_per_slot: 1,
        }],
    );
    CreateScheduleRequest {
        weekly_schedule: weekly,
        default_slot_duration_minutes: Some(30),
        buffer_minutes: Some(5),
        is_active: Some(true),
    }
}

// 2026-01-05 is a Monday.
fn a_monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 1, 5).unwrap()
}

#[tokio::test]
async fn duplicate_create_conflicts() {
    let (service, _) = service();
    let doctor_id = Uuid::new_v4();

    service
        .create(doctor_id, monday_template(), "tok")
        .await
        .unwrap();

    let err = service
        .create(doctor_id, monday_template(), "tok")
        .await
        .unwrap_err();
    assert!(matches!(err, ScheduleError::AlreadyExists));
}

#[tokio::test]
async fn create_rejects_overlapping_template_ranges() {
    let (service, _) = service();
    let mut request = monday_template();
    request.weekly_schedule.get_mut(&DayOfWeek::Monday).unwrap().push(SlotRange {
        start_time: t(10, 0),
        end_time: t(12, 0),
        max_patients_per_slot: 1,
    });

    let err = service
        .create(Uuid::new_v4(), request, "tok")
        .await
        .unwrap_err();
    assert!(matches!(err, ScheduleError::ValidationError(_)));
}

#[tokio::test]
async fn missing_schedule_is_not_found_but_slots_are_empty() {
    // One policy per path: the schedule fetch 404s, the slot listing is
    // an empty 200.
    let (service, _) = service();
    let doctor_id = Uuid::new_v4();

    let err = service.get(doctor_id, "tok").await.unwrap_err();
    assert!(matches!(err, ScheduleError::NotFound));

    let slots = service
        .available_slots(doctor_id, a_monday(), "tok")
        .await
        .unwrap();
    assert!(slots.is_empty());
}

#[tokio::test]
async fn update_merges_per_field() {
    let (service, _) = service();
    let doctor_id = Uuid::new_v4();
    service
        .create(doctor_id, monday_template(), "tok")
        .await
        .unwrap();

    let updated = service
        .update(
            doctor_id,
            UpdateScheduleRequest {
                weekly_schedule: None,
                default_slot_duration_minutes: None,
                buffer_minutes: Some(10),
                is_active: None,
            },
            "tok",
        )
        .await
        .unwrap();

    // Only the buffer changed; the template survived the partial update.
    assert_eq!(updated.buffer_minutes, 10);
    assert_eq!(updated.default_slot_duration_minutes, 30);
    assert!(updated.weekly_schedule.contains_key(&DayOfWeek::Monday));
}

#[tokio::test]
async fn block_date_is_idempotent_and_updates_reason() {
    let (service, _) = service();
    let doctor_id = Uuid::new_v4();
    service
        .create(doctor_id, monday_template(), "tok")
        .await
        .unwrap();

    service
        .block_date(
            doctor_id,
            BlockDateRequest {
                date: a_monday(),
                reason: "vacation".to_string(),
                slots: None,
            },
            "tok",
        )
        .await
        .unwrap();

    let updated = service
        .block_date(
            doctor_id,
            BlockDateRequest {
                date: a_monday(),
                reason: "conference".to_string(),
                slots: None,
            },
            "tok",
        )
        .await
        .unwrap();

    assert_eq!(updated.blocked_dates.len(), 1);
    assert_eq!(updated.blocked_dates[0].reason, "conference");
}

#[tokio::test]
async fn unblock_of_unblocked_date_is_a_no_op() {
    let (service, _) = service();
    let doctor_id = Uuid::new_v4();
    service
        .create(doctor_id, monday_template(), "tok")
        .await
        .unwrap();

    let schedule = service
        .unblock_date(doctor_id, a_monday(), "tok")
        .await
        .unwrap();
    assert!(schedule.blocked_dates.is_empty());
}

#[tokio::test]
async fn blocked_then_unblocked_date_serves_slots_again() {
    let (service, _) = service();
    let doctor_id = Uuid::new_v4();
    service
        .create(doctor_id, monday_template(), "tok")
        .await
        .unwrap();

    service
        .block_date(
            doctor_id,
            BlockDateRequest {
                date: a_monday(),
                reason: "vacation".to_string(),
                slots: None,
            },
            "tok",
        )
        .await
        .unwrap();
    assert!(service
        .available_slots(doctor_id, a_monday(), "tok")
        .await
        .unwrap()
        .is_empty());

    service
        .unblock_date(doctor_id, a_monday(), "tok")
        .await
        .unwrap();
    assert_eq!(
        service
            .available_slots(doctor_id, a_monday(), "tok")
            .await
            .unwrap()
            .len(),
        3
    );
}

#[tokio::test]
async fn partial_block_removes_only_overlapping_slots() {
    let (service, _) = service();
    let doctor_id = Uuid::new_v4();
    service
        .create(doctor_id, monday_template(), "tok")
        .await
        .unwrap();

    service
        .block_date(
            doctor_id,
            BlockDateRequest {
                date: a_monday(),
                reason: "meeting".to_string(),
                slots: Some(vec![TimeWindow {
                    start_time: t(10, 10),
                    end_time: t(10, 40),
                }]),
            },
            "tok",
        )
        .await
        .unwrap();

    let slots = service
        .available_slots(doctor_id, a_monday(), "tok")
        .await
        .unwrap();
    let times: Vec<String> = slots.iter().map(|s| s.time().to_string()).collect();
    assert_eq!(times, vec!["09:00-09:30", "09:35-10:05"]);
}

#[tokio::test]
async fn recurring_slots_report_applied_and_skipped_days() {
    let (service, _) = service();
    let doctor_id = Uuid::new_v4();
    service
        .create(doctor_id, monday_template(), "tok")
        .await
        .unwrap();

    // 10:00-12:00 overlaps Monday's 09:00-11:00 template but not
    // Tuesday's empty one. Without the skip flag the whole request is
    // refused.
    let err = service
        .add_recurring_slots(
            doctor_id,
            AddRecurringSlotsRequest {
                start_time: t(10, 0),
                end_time: t(12, 0),
                days: vec![DayOfWeek::Monday, DayOfWeek::Tuesday],
                max_patients_per_slot: None,
                skip_overlapping_days: false,
            },
            "tok",
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ScheduleError::OverlappingRange { ref days } if days == &vec![DayOfWeek::Monday]
    ));

    let result = service
        .add_recurring_slots(
            doctor_id,
            AddRecurringSlotsRequest {
                start_time: t(10, 0),
                end_time: t(12, 0),
                days: vec![DayOfWeek::Monday, DayOfWeek::Tuesday],
                max_patients_per_slot: None,
                skip_overlapping_days: true,
            },
            "tok",
        )
        .await
        .unwrap();
    assert_eq!(result.applied, vec![DayOfWeek::Tuesday]);
    assert_eq!(result.skipped, vec![DayOfWeek::Monday]);

    // The Tuesday after a_monday now has generated slots.
    let tuesday = a_monday() + Duration::days(1);
    let slots = service
        .available_slots(doctor_id, tuesday, "tok")
        .await
        .unwrap();
    assert!(!slots.is_empty());
    assert_eq!(slots[0].time().to_string(), "10:00-10:30");
}

#[tokio::test]
async fn occupancy_marks_slots_unavailable() {
    let (service, repo) = service();
    let doctor_id = Uuid::new_v4();
    service
        .create(doctor_id, monday_template(), "tok")
        .await
        .unwrap();

    repo.seed_claims(
        doctor_id,
        a_monday(),
        vec![
            SlotClaim {
                appointment_time: "09:00-09:30".parse::<SlotTime>().unwrap(),
                status: AppointmentStatus::Confirmed,
                payment_status: PaymentStatus::Paid,
                checkout_lock_until: None,
            },
            // Unexpired lock on the second slot.
            SlotClaim {
                appointment_time: "09:35-10:05".parse::<SlotTime>().unwrap(),
                status: AppointmentStatus::Pending,
                payment_status: PaymentStatus::Pending,
                checkout_lock_until: Some(Utc::now() + Duration::minutes(10)),
            },
            // Expired lock on the third: still free.
            SlotClaim {
                appointment_time: "10:10-10:40".parse::<SlotTime>().unwrap(),
                status: AppointmentStatus::Pending,
                payment_status: PaymentStatus::Pending,
                checkout_lock_until: Some(Utc::now() - Duration::minutes(1)),
            },
        ],
    );

    let slots = service
        .available_slots(doctor_id, a_monday(), "tok")
        .await
        .unwrap();
    let availability: Vec<bool> = slots.iter().map(|s| s.available).collect();
    assert_eq!(availability, vec![false, false, true]);
}

#[tokio::test]
async fn delete_is_irreversible() {
    let (service, _) = service();
    let doctor_id = Uuid::new_v4();
    service
        .create(doctor_id, monday_template(), "tok")
        .await
        .unwrap();

    service.delete(doctor_id, "tok").await.unwrap();

    let err = service.get(doctor_id, "tok").await.unwrap_err();
    assert!(matches!(err, ScheduleError::NotFound));

    let err = service.delete(doctor_id, "tok").await.unwrap_err();
    assert!(matches!(err, ScheduleError::NotFound));
}
