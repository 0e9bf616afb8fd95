// Appointment lifecycle flows over the in-memory repositories: booking
// validation against the schedule, approval, cancellation refunds,
// reschedule capping and the consultation-session guards.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Duration, NaiveTime, Utc};
use uuid::Uuid;

use appointment_cell::models::{
    BookingError, CancelAppointmentRequest, CreateAppointmentRequest,
    RejectAppointmentRequest, RescheduleAppointmentRequest,
};
use appointment_cell::repo::{AppointmentRepo, InMemoryAppointmentRepo};
use appointment_cell::services::booking::AppointmentBookingService;
use appointment_cell::services::notify::Notifier;
use payment_cell::models::LedgerCategory;
use payment_cell::repo::InMemoryWalletRepo;
use payment_cell::services::split::PaymentSplitEngine;
use schedule_cell::models::{DayOfWeek, DoctorSchedule, SlotRange};
use schedule_cell::repo::InMemoryScheduleRepo;
use shared_config::policy::{BookingPolicy, CancellationInitiator};
use shared_models::booking::{
    AppointmentStatus, AppointmentType, PaymentStatus, SlotClaim, SlotTime,
};

struct SilentNotifier;
impl Notifier for SilentNotifier {
    fn notify(&self, _recipient: Uuid, _event: &str, _message: &str) {}
}

fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

struct Harness {
    repo: Arc<InMemoryAppointmentRepo>,
    schedules: Arc<InMemoryScheduleRepo>,
    wallet: Arc<InMemoryWalletRepo>,
    service: AppointmentBookingService,
    platform_account_id: Uuid,
}

fn harness() -> Harness {
    let repo = Arc::new(InMemoryAppointmentRepo::new());
    let schedules = Arc::new(InMemoryScheduleRepo::new());
    let wallet = Arc::new(InMemoryWalletRepo::new());
    let platform_account_id = Uuid::new_v4();
    let engine = PaymentSplitEngine::new(
        wallet.clone(),
        BookingPolicy::default(),
        platform_account_id,
    );
    let service = AppointmentBookingService::with_parts(
        repo.clone(),
        schedules.clone(),
        engine,
        Arc::new(SilentNotifier),
    );
    Harness {
        repo,
        schedules,
        wallet,
        service,
        platform_account_id,
    }
}

/// Seed an all-week 09:00-17:00 schedule so future dates always have the
/// 09:00-09:30 slot.
async fn seed_schedule(h: &Harness, doctor_id: Uuid) {
    let mut weekly = BTreeMap::new();
    for day in [
        DayOfWeek::Monday,
        DayOfWeek::Tuesday,
        DayOfWeek::Wednesday,
        DayOfWeek::Thursday,
        DayOfWeek::Friday,
        DayOfWeek::Saturday,
        DayOfWeek::Sunday,
    ] {
        weekly.insert(
            day,
            vec![SlotRange {
                start_time: t(9, 0),
                end_time: t(17, 0),
                max_patients_per_slot: 1,
            }],
        );
    }
    let now = Utc::now();
    use schedule_cell::repo::ScheduleRepo;
    h.schedules
        .insert(
            DoctorSchedule {
                doctor_id,
                weekly_schedule: weekly,
                default_slot_duration_minutes: 30,
                buffer_minutes: 5,
                blocked_dates: vec![],
                recurring_exceptions: vec![],
                is_active: true,
                created_at: now,
                updated_at: now,
            },
            "tok",
        )
        .await
        .unwrap();
}

fn booking_request(doctor_id: Uuid) -> CreateAppointmentRequest {
    CreateAppointmentRequest {
        doctor_id,
        appointment_date: (Utc::now() + Duration::days(7)).date_naive(),
        appointment_time: "09:00-09:30".parse::<SlotTime>().unwrap(),
        appointment_type: AppointmentType::Video,
    }
}

/// Directly mark an appointment paid, as if checkout had completed.
async fn force_paid(h: &Harness, id: Uuid, fees: i64) {
    h.repo.mark_paid(id, "pay_seeded", fees * 8 / 10, fees - fees * 8 / 10, "tok")
        .await
        .unwrap();
    h.repo
        .update_fields(
            id,
            appointment_cell::models::AppointmentPatch {
                consultation_fees: Some(fees),
                ..Default::default()
            },
            "tok",
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn booking_lands_on_a_generated_slot() {
    let h = harness();
    let doctor_id = Uuid::new_v4();
    seed_schedule(&h, doctor_id).await;

    let appointment = h
        .service
        .create_appointment(Uuid::new_v4(), booking_request(doctor_id), "tok")
        .await
        .unwrap();

    assert_eq!(appointment.status, AppointmentStatus::Pending);
    assert_eq!(appointment.payment_status, PaymentStatus::Pending);
    assert_eq!(appointment.appointment_time.to_string(), "09:00-09:30");
    assert!(appointment.custom_id.starts_with("APT-"));
}

#[tokio::test]
async fn booking_off_grid_slot_is_rejected() {
    let h = harness();
    let doctor_id = Uuid::new_v4();
    seed_schedule(&h, doctor_id).await;

    let mut request = booking_request(doctor_id);
    // 09:10-09:40 is not on the 30+5 grid.
    request.appointment_time = "09:10-09:40".parse::<SlotTime>().unwrap();

    let err = h
        .service
        .create_appointment(Uuid::new_v4(), request, "tok")
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::SlotNotAvailable));
}

#[tokio::test]
async fn booking_without_schedule_is_rejected() {
    let h = harness();
    let err = h
        .service
        .create_appointment(Uuid::new_v4(), booking_request(Uuid::new_v4()), "tok")
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::SlotNotAvailable));
}

#[tokio::test]
async fn booking_a_full_slot_conflicts() {
    let h = harness();
    let doctor_id = Uuid::new_v4();
    seed_schedule(&h, doctor_id).await;

    let request = booking_request(doctor_id);
    h.schedules.seed_claims(
        doctor_id,
        request.appointment_date,
        vec![SlotClaim {
            appointment_time: request.appointment_time,
            status: AppointmentStatus::Confirmed,
            payment_status: PaymentStatus::Paid,
            checkout_lock_until: None,
        }],
    );

    let err = h
        .service
        .create_appointment(Uuid::new_v4(), request, "tok")
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::SlotTaken));
}

#[tokio::test]
async fn approve_confirms_a_pending_appointment() {
    let h = harness();
    let doctor_id = Uuid::new_v4();
    seed_schedule(&h, doctor_id).await;

    let appointment = h
        .service
        .create_appointment(Uuid::new_v4(), booking_request(doctor_id), "tok")
        .await
        .unwrap();

    let updated = h.service.approve(appointment.id, "tok").await.unwrap();
    assert_eq!(updated.status, AppointmentStatus::Confirmed);

    // A confirmed appointment cannot be approved again.
    let err = h.service.approve(appointment.id, "tok").await.unwrap_err();
    assert!(matches!(err, BookingError::InvalidStatusTransition(_)));
}

#[tokio::test]
async fn patient_cancellation_of_paid_appointment_splits_refund() {
    // Fee 1000, patient cancels: 700 back to the patient, 100 to the
    // platform, 200 to the doctor.
    let h = harness();
    let doctor_id = Uuid::new_v4();
    seed_schedule(&h, doctor_id).await;

    let appointment = h
        .service
        .create_appointment(Uuid::new_v4(), booking_request(doctor_id), "tok")
        .await
        .unwrap();
    force_paid(&h, appointment.id, 1000).await;
    h.service.approve(appointment.id, "tok").await.unwrap();

    let updated = h
        .service
        .cancel(
            appointment.id,
            CancellationInitiator::Patient,
            CancelAppointmentRequest {
                reason: "Cannot attend".to_string(),
                no_show: false,
            },
            "tok",
        )
        .await
        .unwrap();

    assert_eq!(updated.status, AppointmentStatus::Cancelled);
    assert_eq!(updated.payment_status, PaymentStatus::Refunded);
    assert_eq!(updated.cancellation_reason.as_deref(), Some("Cannot attend"));

    let entries = h.wallet.entries_for_appointment(appointment.id);
    assert_eq!(entries.len(), 3);
    assert_eq!(entries.iter().map(|e| e.amount).sum::<i64>(), 1000);

    let amount_for = |owner: Uuid| {
        entries
            .iter()
            .filter(|e| e.owner_user_id == owner)
            .map(|e| e.amount)
            .sum::<i64>()
    };
    assert_eq!(amount_for(appointment.patient_id), 700);
    assert_eq!(amount_for(h.platform_account_id), 100);
    assert_eq!(amount_for(doctor_id), 200);
    assert!(entries
        .iter()
        .any(|e| e.owner_user_id == appointment.patient_id
            && e.category == LedgerCategory::Refund));
}

#[tokio::test]
async fn doctor_cancellation_refunds_in_full() {
    let h = harness();
    let doctor_id = Uuid::new_v4();
    seed_schedule(&h, doctor_id).await;

    let appointment = h
        .service
        .create_appointment(Uuid::new_v4(), booking_request(doctor_id), "tok")
        .await
        .unwrap();
    force_paid(&h, appointment.id, 1000).await;
    h.service.approve(appointment.id, "tok").await.unwrap();

    h.service
        .cancel(
            appointment.id,
            CancellationInitiator::Doctor,
            CancelAppointmentRequest {
                reason: "Emergency".to_string(),
                no_show: false,
            },
            "tok",
        )
        .await
        .unwrap();

    let entries = h.wallet.entries_for_appointment(appointment.id);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].owner_user_id, appointment.patient_id);
    assert_eq!(entries[0].amount, 1000);
}

#[tokio::test]
async fn no_show_forfeits_the_refund() {
    let h = harness();
    let doctor_id = Uuid::new_v4();
    seed_schedule(&h, doctor_id).await;

    let appointment = h
        .service
        .create_appointment(Uuid::new_v4(), booking_request(doctor_id), "tok")
        .await
        .unwrap();
    force_paid(&h, appointment.id, 1000).await;
    h.service.approve(appointment.id, "tok").await.unwrap();

    h.service
        .cancel(
            appointment.id,
            CancellationInitiator::NoShow,
            CancelAppointmentRequest {
                reason: "Patient did not join".to_string(),
                no_show: true,
            },
            "tok",
        )
        .await
        .unwrap();

    let entries = h.wallet.entries_for_appointment(appointment.id);
    let patient_total: i64 = entries
        .iter()
        .filter(|e| e.owner_user_id == appointment.patient_id)
        .map(|e| e.amount)
        .sum();
    assert_eq!(patient_total, 0);
    assert_eq!(entries.iter().map(|e| e.amount).sum::<i64>(), 1000);
}

#[tokio::test]
async fn cancellation_requires_a_reason() {
    let h = harness();
    let doctor_id = Uuid::new_v4();
    seed_schedule(&h, doctor_id).await;

    let appointment = h
        .service
        .create_appointment(Uuid::new_v4(), booking_request(doctor_id), "tok")
        .await
        .unwrap();

    let err = h
        .service
        .cancel(
            appointment.id,
            CancellationInitiator::Patient,
            CancelAppointmentRequest {
                reason: "  ".to_string(),
                no_show: false,
            },
            "tok",
        )
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::ReasonRequired));
}

#[tokio::test]
async fn rejection_requires_a_reason_and_is_terminal() {
    let h = harness();
    let doctor_id = Uuid::new_v4();
    seed_schedule(&h, doctor_id).await;

    let appointment = h
        .service
        .create_appointment(Uuid::new_v4(), booking_request(doctor_id), "tok")
        .await
        .unwrap();

    let err = h
        .service
        .reject(
            appointment.id,
            RejectAppointmentRequest { reason: "".to_string() },
            "tok",
        )
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::ReasonRequired));

    let updated = h
        .service
        .reject(
            appointment.id,
            RejectAppointmentRequest {
                reason: "Outside my specialty".to_string(),
            },
            "tok",
        )
        .await
        .unwrap();
    assert_eq!(updated.status, AppointmentStatus::Rejected);

    let err = h.service.approve(appointment.id, "tok").await.unwrap_err();
    assert!(matches!(err, BookingError::InvalidStatusTransition(_)));
}

#[tokio::test]
async fn reschedule_is_capped_at_one() {
    let h = harness();
    let doctor_id = Uuid::new_v4();
    seed_schedule(&h, doctor_id).await;

    let appointment = h
        .service
        .create_appointment(Uuid::new_v4(), booking_request(doctor_id), "tok")
        .await
        .unwrap();
    h.service.approve(appointment.id, "tok").await.unwrap();

    let new_date = (Utc::now() + Duration::days(8)).date_naive();
    let updated = h
        .service
        .reschedule(
            appointment.id,
            RescheduleAppointmentRequest {
                new_date,
                new_time: "10:10-10:40".parse::<SlotTime>().unwrap(),
            },
            "tok",
        )
        .await
        .unwrap();
    assert_eq!(updated.status, AppointmentStatus::RescheduleRequested);
    assert_eq!(updated.reschedule_count, 1);
    assert_eq!(updated.appointment_date, new_date);

    // Doctor accepts the new time, then a second reschedule is refused.
    h.service.approve(appointment.id, "tok").await.unwrap();
    let err = h
        .service
        .reschedule(
            appointment.id,
            RescheduleAppointmentRequest {
                new_date: (Utc::now() + Duration::days(9)).date_naive(),
                new_time: "09:00-09:30".parse::<SlotTime>().unwrap(),
            },
            "tok",
        )
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::RescheduleLimitReached));
}

#[tokio::test]
async fn reschedule_requires_confirmed_status() {
    let h = harness();
    let doctor_id = Uuid::new_v4();
    seed_schedule(&h, doctor_id).await;

    let appointment = h
        .service
        .create_appointment(Uuid::new_v4(), booking_request(doctor_id), "tok")
        .await
        .unwrap();

    let err = h
        .service
        .reschedule(
            appointment.id,
            RescheduleAppointmentRequest {
                new_date: (Utc::now() + Duration::days(8)).date_naive(),
                new_time: "09:00-09:30".parse::<SlotTime>().unwrap(),
            },
            "tok",
        )
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::InvalidStatusTransition(_)));
}

#[tokio::test]
async fn completion_only_from_confirmed() {
    let h = harness();
    let doctor_id = Uuid::new_v4();
    seed_schedule(&h, doctor_id).await;

    let appointment = h
        .service
        .create_appointment(Uuid::new_v4(), booking_request(doctor_id), "tok")
        .await
        .unwrap();

    let err = h.service.complete(appointment.id, "tok").await.unwrap_err();
    assert!(matches!(err, BookingError::InvalidStatusTransition(_)));

    h.service.approve(appointment.id, "tok").await.unwrap();
    let updated = h.service.complete(appointment.id, "tok").await.unwrap();
    assert_eq!(updated.status, AppointmentStatus::Completed);
}

#[tokio::test]
async fn consultation_start_guards_hold() {
    let h = harness();
    let doctor_id = Uuid::new_v4();
    seed_schedule(&h, doctor_id).await;

    let appointment = h
        .service
        .create_appointment(Uuid::new_v4(), booking_request(doctor_id), "tok")
        .await
        .unwrap();
    force_paid(&h, appointment.id, 1000).await;
    h.service.approve(appointment.id, "tok").await.unwrap();

    // Paid and confirmed, but a week out: not today, no session.
    let err = h
        .service
        .start_consultation(appointment.id, "tok")
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::ValidationError(_)));
}

#[tokio::test]
async fn chat_toggle_is_independent_of_status() {
    let h = harness();
    let doctor_id = Uuid::new_v4();
    seed_schedule(&h, doctor_id).await;

    let appointment = h
        .service
        .create_appointment(Uuid::new_v4(), booking_request(doctor_id), "tok")
        .await
        .unwrap();
    h.service.approve(appointment.id, "tok").await.unwrap();
    h.service.complete(appointment.id, "tok").await.unwrap();

    // Completed is terminal for status, but the chat side channel and
    // notes stay writable.
    let updated = h
        .service
        .set_chat_enabled(appointment.id, true, "tok")
        .await
        .unwrap();
    assert!(updated.chat_enabled);

    let updated = h
        .service
        .attach_notes(appointment.id, "Follow up in two weeks".to_string(), "tok")
        .await
        .unwrap();
    assert_eq!(updated.notes.as_deref(), Some("Follow up in two weeks"));
}
