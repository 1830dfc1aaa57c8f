// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State, Extension},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::extractor::{require_admin, require_privileged};

use crate::models::{
    AppointmentError, AppointmentListQuery, AvailableSlotsQuery, CancelAppointmentRequest,
    ConfirmAppointmentRequest, CreateAppointmentRequest, UpdateAppointmentRequest,
};
use crate::services::booking::{Actor, AppointmentBookingService};

/// Shared state of the appointment routes.
#[derive(Clone)]
pub struct AppointmentCellState {
    pub service: Arc<AppointmentBookingService>,
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        let status = match &err {
            AppointmentError::NotFound | AppointmentError::ClientNotFound => StatusCode::NOT_FOUND,
            AppointmentError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppointmentError::SchedulingConflict
            | AppointmentError::NotEditable(_)
            | AppointmentError::NotCancellable(_)
            | AppointmentError::InvalidTransition { .. } => StatusCode::CONFLICT,
            AppointmentError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppointmentError::InvalidProvider(_)
            | AppointmentError::ClientInactive
            | AppointmentError::InvalidDuration(_)
            | AppointmentError::OutOfBusinessHours(_)
            | AppointmentError::PastSchedulingError
            | AppointmentError::ValidationError(_) => StatusCode::BAD_REQUEST,
        };

        AppError::Domain {
            status,
            code: err.kind(),
            message: err.to_string(),
        }
    }
}

fn actor(user: &User) -> Actor<'_> {
    Actor::new(&user.id, user.is_privileged())
}

// ==============================================================================
// BOOKING HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_appointment(
    State(state): State<AppointmentCellState>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let details = state.service.create_appointment(request, actor(&user)).await?;
    Ok((StatusCode::CREATED, Json(json!(details))))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<AppointmentCellState>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let details = state.service.get_appointment_details(appointment_id, actor(&user)).await?;
    Ok(Json(json!(details)))
}

#[axum::debug_handler]
pub async fn update_appointment(
    State(state): State<AppointmentCellState>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let appointment = state.service.update_appointment(appointment_id, request, actor(&user)).await?;
    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<AppointmentCellState>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<CancelAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let appointment = state.service.cancel_appointment(appointment_id, request, actor(&user)).await?;
    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn confirm_appointment(
    State(state): State<AppointmentCellState>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<ConfirmAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    require_privileged(&user)?;

    let appointment = state.service.confirm_appointment(appointment_id, request).await?;
    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn complete_appointment(
    State(state): State<AppointmentCellState>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_privileged(&user)?;

    let appointment = state.service.complete_appointment(appointment_id).await?;
    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn delete_appointment(
    State(state): State<AppointmentCellState>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<StatusCode, AppError> {
    require_admin(&user)?;

    state.service.delete_appointment(appointment_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ==============================================================================
// LISTING HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<AppointmentCellState>,
    Query(query): Query<AppointmentListQuery>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_privileged(&user)?;

    let page = state.service.list_appointments(query).await?;
    Ok(Json(json!(page)))
}

#[axum::debug_handler]
pub async fn count_appointments(
    State(state): State<AppointmentCellState>,
    Query(query): Query<AppointmentListQuery>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_privileged(&user)?;

    let total = state.service.count_appointments(query).await?;
    Ok(Json(json!({ "total": total })))
}

#[axum::debug_handler]
pub async fn get_my_appointments(
    State(state): State<AppointmentCellState>,
    Query(query): Query<AppointmentListQuery>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let page = state.service.get_my_appointments(&user.id, query).await?;
    Ok(Json(json!(page)))
}

// ==============================================================================
// AVAILABILITY HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_available_slots(
    State(state): State<AppointmentCellState>,
    Query(query): Query<AvailableSlotsQuery>,
) -> Result<Json<Value>, AppError> {
    let response = state.service
        .get_available_slots(&query.provider_id, query.date, query.duration_minutes)
        .await?;
    Ok(Json(json!(response)))
}

#[axum::debug_handler]
pub async fn list_providers(
    State(state): State<AppointmentCellState>,
) -> Result<Json<Value>, AppError> {
    Ok(Json(json!({ "providers": state.service.list_providers() })))
}
