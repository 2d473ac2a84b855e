use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
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
    AppointmentError, AvailabilityQuery, BookAppointmentRequest, CancelAppointmentRequest,
    HealthConditionQuery,
};
use crate::services::booking::AppointmentBookingService;
use crate::services::conditions::HealthConditionService;

#[axum::debug_handler]
pub async fn get_doctor_availability(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<Value>, AppError> {
    let booking_service = AppointmentBookingService::new(&state);

    let days = booking_service
        .doctor_availability(doctor_id, query)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!(days)))
}

#[axum::debug_handler]
pub async fn get_health_categories(
    State(state): State<Arc<AppConfig>>,
) -> Result<Json<Value>, AppError> {
    let service = HealthConditionService::new(&state);

    let categories = service
        .categories()
        .await
        .map_err(map_appointment_error)?;

    let rows: Vec<Value> = categories
        .into_iter()
        .map(|name| json!({ "name": name }))
        .collect();

    Ok(Json(json!(rows)))
}

#[axum::debug_handler]
pub async fn get_health_conditions(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<HealthConditionQuery>,
) -> Result<Json<Value>, AppError> {
    let service = HealthConditionService::new(&state);

    let conditions = service
        .conditions(query.category.as_deref())
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!(conditions)))
}

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let token = auth.token();
    let booking_service = AppointmentBookingService::new(&state);

    let appointment = booking_service
        .book_appointment(&user, request, token)
        .await
        .map_err(map_appointment_error)?;

    Ok((StatusCode::CREATED, Json(json!(appointment))))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let booking_service = AppointmentBookingService::new(&state);

    let detail = booking_service
        .get_appointment_detail(appointment_id, &user, token)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!(detail)))
}

#[axum::debug_handler]
pub async fn get_my_appointments(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let booking_service = AppointmentBookingService::new(&state);

    let appointments = booking_service
        .appointments_for_user(&user, token)
        .await
        .map_err(map_appointment_error)?;

    let total = appointments.len();
    Ok(Json(json!({
        "appointments": appointments,
        "total": total
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
    let token = auth.token();
    let booking_service = AppointmentBookingService::new(&state);

    let appointment = booking_service
        .cancel_appointment(appointment_id, &user, request, token)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!(appointment)))
}

fn map_appointment_error(e: AppointmentError) -> AppError {
    match e {
        AppointmentError::NotFound => AppError::NotFound("Appointment not found".to_string()),
        AppointmentError::DoctorNotFound => AppError::NotFound("Doctor not found".to_string()),
        AppointmentError::SlotUnavailable => {
            AppError::Conflict("This time slot is not available".to_string())
        }
        AppointmentError::Validation(msg) => AppError::ValidationError(msg),
        AppointmentError::InvalidStatusTransition(status) => {
            AppError::Conflict(format!("Cannot cancel an appointment with status: {}", status))
        }
        AppointmentError::Unauthorized => {
            AppError::Forbidden("Not authorized to access this appointment".to_string())
        }
        AppointmentError::Database(msg) => AppError::Database(msg),
    }
}
