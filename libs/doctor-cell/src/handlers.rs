use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{DoctorError, UpdateScheduleRequest};
use crate::services::DoctorService;

#[axum::debug_handler]
pub async fn get_doctor_profile(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = DoctorService::new(&state);

    let doctor = service
        .get_doctor(doctor_id, None)
        .await
        .map_err(map_doctor_error)?;

    Ok(Json(json!(doctor)))
}

#[axum::debug_handler]
pub async fn update_doctor_schedule(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateScheduleRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = DoctorService::new(&state);

    // Only the doctor behind this profile or an admin may edit the schedule.
    let doctor = service
        .get_doctor(doctor_id, Some(token))
        .await
        .map_err(map_doctor_error)?;

    if doctor.user_id.to_string() != user.id && !user.is_admin() {
        return Err(AppError::Forbidden(
            "Not authorized to update this doctor's schedule".to_string(),
        ));
    }

    let updated = service
        .update_schedule(doctor_id, request.availability_schedule, token)
        .await
        .map_err(map_doctor_error)?;

    Ok(Json(json!({
        "success": true,
        "doctor": updated,
        "message": "Availability schedule updated"
    })))
}

fn map_doctor_error(e: DoctorError) -> AppError {
    match e {
        DoctorError::NotFound => AppError::NotFound("Doctor not found".to_string()),
        DoctorError::Validation(msg) => AppError::ValidationError(msg),
        DoctorError::Database(msg) => AppError::Database(msg),
    }
}
