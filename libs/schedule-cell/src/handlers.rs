// libs/schedule-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    AddRecurringSlotsRequest, AvailableSlotsQuery, BlockDateRequest, CreateScheduleRequest,
    ScheduleError, UnblockDateRequest, UpdateScheduleRequest,
};
use crate::services::schedule::ScheduleService;

fn map_schedule_error(error: ScheduleError) -> AppError {
    match error {
        ScheduleError::NotFound => AppError::NotFound("Schedule not found".to_string()),
        ScheduleError::AlreadyExists => AppError::Conflict(
            "A schedule already exists for this doctor; update it instead".to_string(),
        ),
        ScheduleError::ValidationError(msg) => AppError::ValidationError(msg),
        ScheduleError::OverlappingRange { days } => AppError::Conflict(format!(
            "Range overlaps the existing template on: {}",
            days.iter()
                .map(|d| d.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        )),
        ScheduleError::DatabaseError(msg) => AppError::Database(msg),
    }
}

fn parse_user_id(user: &User) -> Result<Uuid, AppError> {
    Uuid::parse_str(&user.id).map_err(|_| AppError::BadRequest("Invalid user id".to_string()))
}

/// Owner-or-admin check shared by the mutating handlers.
fn authorize_schedule_write(user: &User, doctor_id: Uuid) -> Result<(), AppError> {
    if user.is_admin() {
        return Ok(());
    }
    if user.is_doctor() && user.id == doctor_id.to_string() {
        return Ok(());
    }
    Err(AppError::Forbidden(
        "Not authorized to manage this schedule".to_string(),
    ))
}

#[axum::debug_handler]
pub async fn create_schedule(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateScheduleRequest>,
) -> Result<Json<Value>, AppError> {
    if !user.is_doctor() {
        return Err(AppError::Forbidden(
            "Only doctors can create a schedule".to_string(),
        ));
    }
    let doctor_id = parse_user_id(&user)?;

    let service = ScheduleService::new(&state);
    let schedule = service
        .create(doctor_id, request, auth.token())
        .await
        .map_err(map_schedule_error)?;

    Ok(Json(json!({
        "success": true,
        "schedule": schedule,
        "message": "Schedule created successfully"
    })))
}

#[axum::debug_handler]
pub async fn get_my_schedule(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let doctor_id = parse_user_id(&user)?;

    let service = ScheduleService::new(&state);
    let schedule = service
        .get(doctor_id, auth.token())
        .await
        .map_err(map_schedule_error)?;

    Ok(Json(json!(schedule)))
}

#[axum::debug_handler]
pub async fn get_schedule(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(_user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let service = ScheduleService::new(&state);
    let schedule = service
        .get(doctor_id, auth.token())
        .await
        .map_err(map_schedule_error)?;

    Ok(Json(json!(schedule)))
}

#[axum::debug_handler]
pub async fn update_schedule(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateScheduleRequest>,
) -> Result<Json<Value>, AppError> {
    authorize_schedule_write(&user, doctor_id)?;

    let service = ScheduleService::new(&state);
    let schedule = service
        .update(doctor_id, request, auth.token())
        .await
        .map_err(map_schedule_error)?;

    Ok(Json(json!({
        "success": true,
        "schedule": schedule,
        "message": "Schedule updated successfully"
    })))
}

#[axum::debug_handler]
pub async fn block_date(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<BlockDateRequest>,
) -> Result<Json<Value>, AppError> {
    authorize_schedule_write(&user, doctor_id)?;

    let service = ScheduleService::new(&state);
    let schedule = service
        .block_date(doctor_id, request, auth.token())
        .await
        .map_err(map_schedule_error)?;

    Ok(Json(json!({
        "success": true,
        "schedule": schedule,
        "message": "Date blocked"
    })))
}

#[axum::debug_handler]
pub async fn unblock_date(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UnblockDateRequest>,
) -> Result<Json<Value>, AppError> {
    authorize_schedule_write(&user, doctor_id)?;

    let service = ScheduleService::new(&state);
    let schedule = service
        .unblock_date(doctor_id, request.date, auth.token())
        .await
        .map_err(map_schedule_error)?;

    Ok(Json(json!({
        "success": true,
        "schedule": schedule,
        "message": "Date unblocked"
    })))
}

#[axum::debug_handler]
pub async fn add_recurring_slots(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<AddRecurringSlotsRequest>,
) -> Result<Json<Value>, AppError> {
    authorize_schedule_write(&user, doctor_id)?;

    let service = ScheduleService::new(&state);
    let result = service
        .add_recurring_slots(doctor_id, request, auth.token())
        .await
        .map_err(map_schedule_error)?;

    Ok(Json(json!({
        "success": true,
        "applied": result.applied,
        "skipped": result.skipped
    })))
}

#[axum::debug_handler]
pub async fn delete_schedule(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    authorize_schedule_write(&user, doctor_id)?;

    let service = ScheduleService::new(&state);
    service
        .delete(doctor_id, auth.token())
        .await
        .map_err(map_schedule_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Schedule deleted"
    })))
}

#[axum::debug_handler]
pub async fn get_available_slots(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<AvailableSlotsQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(_user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let service = ScheduleService::new(&state);
    let slots = service
        .available_slots(doctor_id, query.date, auth.token())
        .await
        .map_err(map_schedule_error)?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "date": query.date,
        "slots": slots
    })))
}
