// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use payment_cell::models::PaymentError;
use schedule_cell::models::ScheduleError;
use shared_config::policy::CancellationInitiator;
use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    Appointment, AttachNotesRequest, BookingError, CancelAppointmentRequest, ChatToggleRequest,
    CreateAppointmentRequest, CreateOrderRequest, RejectAppointmentRequest,
    RescheduleAppointmentRequest, UnlockSlotRequest, VerifyPaymentRequest,
};
use crate::services::booking::AppointmentBookingService;
use crate::services::checkout::CheckoutService;

fn map_booking_error(error: BookingError) -> AppError {
    match error {
        BookingError::NotFound => AppError::NotFound("Appointment not found".to_string()),
        BookingError::SlotNotAvailable => {
            AppError::BadRequest("Requested slot is not bookable".to_string())
        }
        BookingError::SlotTaken => AppError::Conflict("Slot already taken".to_string()),
        BookingError::InvalidStatusTransition(status) => {
            AppError::BadRequest(format!("Cannot transition from current status: {}", status))
        }
        BookingError::RescheduleLimitReached => {
            AppError::Conflict("Appointment has already been rescheduled once".to_string())
        }
        BookingError::ReasonRequired => {
            AppError::ValidationError("A reason is required".to_string())
        }
        BookingError::AlreadyPaid => {
            AppError::Conflict("Appointment is already paid".to_string())
        }
        BookingError::Unauthorized => {
            AppError::Forbidden("Not authorized for this appointment".to_string())
        }
        BookingError::ValidationError(msg) => AppError::ValidationError(msg),
        BookingError::DatabaseError(msg) => AppError::Database(msg),
        BookingError::Payment(payment) => match payment {
            PaymentError::NotConfigured => {
                AppError::NotConfigured("Payment gateway keys are not set".to_string())
            }
            PaymentError::InvalidAmount(amount) => {
                AppError::ValidationError(format!("Invalid amount: {}", amount))
            }
            PaymentError::SignatureMismatch => {
                AppError::PaymentVerification("Payment signature mismatch".to_string())
            }
            PaymentError::Gateway(msg) => AppError::ExternalService(msg),
            PaymentError::DatabaseError(msg) => AppError::Database(msg),
        },
        BookingError::Schedule(schedule) => match schedule {
            ScheduleError::NotFound => AppError::NotFound("Schedule not found".to_string()),
            ScheduleError::ValidationError(msg) => AppError::ValidationError(msg),
            ScheduleError::AlreadyExists | ScheduleError::OverlappingRange { .. } => {
                AppError::Conflict(schedule.to_string())
            }
            ScheduleError::DatabaseError(msg) => AppError::Database(msg),
        },
    }
}

fn parse_user_id(user: &User) -> Result<Uuid, AppError> {
    Uuid::parse_str(&user.id).map_err(|_| AppError::BadRequest("Invalid user id".to_string()))
}

fn authorize_participant(user: &User, appointment: &Appointment) -> Result<(), AppError> {
    let is_patient = appointment.patient_id.to_string() == user.id;
    let is_doctor = appointment.doctor_id.to_string() == user.id;
    if is_patient || is_doctor || user.is_admin() {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "Not authorized to view this appointment".to_string(),
        ))
    }
}

fn authorize_assigned_doctor(user: &User, appointment: &Appointment) -> Result<(), AppError> {
    if appointment.doctor_id.to_string() == user.id || user.is_admin() {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "Only the assigned doctor can perform this action".to_string(),
        ))
    }
}

// ==============================================================================
// APPOINTMENT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let patient_id = parse_user_id(&user)?;

    let service = AppointmentBookingService::new(&state);
    let appointment = service
        .create_appointment(patient_id, request, auth.token())
        .await
        .map_err(map_booking_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment requested successfully"
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentBookingService::new(&state);
    let appointment = service
        .get_appointment(appointment_id, auth.token())
        .await
        .map_err(map_booking_error)?;

    authorize_participant(&user, &appointment)?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn approve_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentBookingService::new(&state);
    let appointment = service
        .get_appointment(appointment_id, auth.token())
        .await
        .map_err(map_booking_error)?;
    authorize_assigned_doctor(&user, &appointment)?;

    let updated = service
        .approve(appointment_id, auth.token())
        .await
        .map_err(map_booking_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": updated,
        "message": "Appointment confirmed"
    })))
}

#[axum::debug_handler]
pub async fn reject_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<RejectAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentBookingService::new(&state);
    let appointment = service
        .get_appointment(appointment_id, auth.token())
        .await
        .map_err(map_booking_error)?;
    authorize_assigned_doctor(&user, &appointment)?;

    let updated = service
        .reject(appointment_id, request, auth.token())
        .await
        .map_err(map_booking_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": updated,
        "message": "Appointment rejected"
    })))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CancelAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentBookingService::new(&state);
    let appointment = service
        .get_appointment(appointment_id, auth.token())
        .await
        .map_err(map_booking_error)?;
    authorize_participant(&user, &appointment)?;

    let is_doctor = appointment.doctor_id.to_string() == user.id;
    let initiator = if request.no_show {
        // Only the doctor side can declare a no-show.
        if !is_doctor && !user.is_admin() {
            return Err(AppError::Forbidden(
                "Only the doctor or an admin can report a no-show".to_string(),
            ));
        }
        CancellationInitiator::NoShow
    } else if user.is_admin() {
        CancellationInitiator::Admin
    } else if is_doctor {
        CancellationInitiator::Doctor
    } else {
        CancellationInitiator::Patient
    };

    let updated = service
        .cancel(appointment_id, initiator, request, auth.token())
        .await
        .map_err(map_booking_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": updated,
        "message": "Appointment cancelled"
    })))
}

#[axum::debug_handler]
pub async fn reschedule_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<RescheduleAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentBookingService::new(&state);
    let appointment = service
        .get_appointment(appointment_id, auth.token())
        .await
        .map_err(map_booking_error)?;

    // Reschedule is the patient proposing a new time.
    if appointment.patient_id.to_string() != user.id && !user.is_admin() {
        return Err(AppError::Forbidden(
            "Only the patient can request a reschedule".to_string(),
        ));
    }

    let updated = service
        .reschedule(appointment_id, request, auth.token())
        .await
        .map_err(map_booking_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": updated,
        "message": "Reschedule requested; awaiting doctor approval"
    })))
}

#[axum::debug_handler]
pub async fn complete_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentBookingService::new(&state);
    let appointment = service
        .get_appointment(appointment_id, auth.token())
        .await
        .map_err(map_booking_error)?;

    // Completion belongs to the assigned doctor alone.
    if appointment.doctor_id.to_string() != user.id {
        return Err(AppError::Forbidden(
            "Only the assigned doctor can complete an appointment".to_string(),
        ));
    }

    let updated = service
        .complete(appointment_id, auth.token())
        .await
        .map_err(map_booking_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": updated,
        "message": "Appointment completed"
    })))
}

#[axum::debug_handler]
pub async fn start_consultation(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentBookingService::new(&state);
    let appointment = service
        .get_appointment(appointment_id, auth.token())
        .await
        .map_err(map_booking_error)?;
    authorize_participant(&user, &appointment)?;

    let updated = service
        .start_consultation(appointment_id, auth.token())
        .await
        .map_err(map_booking_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": updated,
        "message": "Consultation started"
    })))
}

#[axum::debug_handler]
pub async fn set_chat(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<ChatToggleRequest>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentBookingService::new(&state);
    let appointment = service
        .get_appointment(appointment_id, auth.token())
        .await
        .map_err(map_booking_error)?;
    authorize_assigned_doctor(&user, &appointment)?;

    let updated = service
        .set_chat_enabled(appointment_id, request.enabled, auth.token())
        .await
        .map_err(map_booking_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": updated,
        "message": if request.enabled { "Chat enabled" } else { "Chat disabled" }
    })))
}

#[axum::debug_handler]
pub async fn attach_notes(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<AttachNotesRequest>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentBookingService::new(&state);
    let appointment = service
        .get_appointment(appointment_id, auth.token())
        .await
        .map_err(map_booking_error)?;
    authorize_assigned_doctor(&user, &appointment)?;

    let updated = service
        .attach_notes(appointment_id, request.notes, auth.token())
        .await
        .map_err(map_booking_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": updated,
        "message": "Notes attached"
    })))
}

// ==============================================================================
// PAYMENT HANDLERS
// ==============================================================================

fn checkout_service(state: &AppConfig) -> Result<CheckoutService, AppError> {
    // Missing gateway keys fail here, at the boundary, before any state
    // is touched.
    if !state.is_payments_configured() {
        return Err(AppError::NotConfigured(
            "Payment gateway keys are not set".to_string(),
        ));
    }
    CheckoutService::new(state).map_err(map_booking_error)
}

#[axum::debug_handler]
pub async fn create_payment_order(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateOrderRequest>,
) -> Result<Json<Value>, AppError> {
    let patient_id = parse_user_id(&user)?;
    let service = checkout_service(&state)?;

    let currency = request.currency.as_deref().unwrap_or("INR");
    let response = service
        .create_order(
            patient_id,
            request.appointment_id,
            request.amount,
            currency,
            auth.token(),
        )
        .await
        .map_err(map_booking_error)?;

    Ok(Json(json!(response)))
}

#[axum::debug_handler]
pub async fn verify_payment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<VerifyPaymentRequest>,
) -> Result<Json<Value>, AppError> {
    let patient_id = parse_user_id(&user)?;
    let service = checkout_service(&state)?;

    let response = service
        .verify_payment(
            patient_id,
            request.appointment_id,
            &request.order_id,
            &request.payment_id,
            &request.signature,
            auth.token(),
        )
        .await
        .map_err(map_booking_error)?;

    Ok(Json(json!({
        "success": true,
        "payment": response,
        "message": "Payment verified"
    })))
}

#[axum::debug_handler]
pub async fn unlock_slot(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UnlockSlotRequest>,
) -> Result<Json<Value>, AppError> {
    let patient_id = parse_user_id(&user)?;
    let service = checkout_service(&state)?;

    service
        .unlock_slot(patient_id, request.appointment_id, auth.token())
        .await
        .map_err(map_booking_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Checkout lock released"
    })))
}
