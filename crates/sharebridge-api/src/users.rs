use axum::{
    Extension, Json,
    extract::{Path, State},
};
use chrono::Utc;
use uuid::Uuid;

use sharebridge_types::api::{ChangePasswordRequest, MessageResponse, UpdateProfileRequest};
use sharebridge_types::models::{PublicUser, UserProfile};

use crate::auth::{hash_password, verify_password};
use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::state::AppState;
use crate::validate;

pub async fn me(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<UserProfile>, ApiError> {
    let user_id = user.id;
    let row = state
        .with_db(move |db| db.get_user_by_id(user_id))
        .await?
        .ok_or(ApiError::NotFound("user"))?;
    Ok(Json(row.profile()))
}

/// Partial update. Blank `phone`/`address` clear the field;
/// `clear_location` drops the stored point.
pub async fn update_me(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<UserProfile>, ApiError> {
    if req.clear_location && req.location.is_some() {
        return Err(ApiError::bad_request("location and clear_location are mutually exclusive"));
    }

    let user_id = user.id;
    let mut row = state
        .with_db(move |db| db.get_user_by_id(user_id))
        .await?
        .ok_or(ApiError::NotFound("user"))?;

    if let Some(name) = &req.name {
        row.name = validate::name(name)?;
    }
    if req.phone.is_some() {
        row.phone = validate::optional("phone", req.phone)?;
    }
    if req.address.is_some() {
        row.address = validate::optional("address", req.address)?;
    }
    if let Some(location) = req.location {
        location.validate()?;
        row.location = Some(location);
    }
    if req.clear_location {
        row.location = None;
    }

    let (name, phone, address, location) = (row.name.clone(), row.phone.clone(), row.address.clone(), row.location);
    state
        .with_db(move |db| {
            db.update_profile(user_id, &name, phone.as_deref(), address.as_deref(), location, Utc::now())
        })
        .await?;
    state.audit(Some(user_id), "profile updated").await?;

    Ok(Json(row.profile()))
}

pub async fn change_password(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    validate::password(&req.new_password)?;

    let user_id = user.id;
    let row = state
        .with_db(move |db| db.get_user_by_id(user_id))
        .await?
        .ok_or(ApiError::NotFound("user"))?;

    if !verify_password(&req.current_password, &row.password)? {
        return Err(ApiError::Unauthorized("current password is wrong".into()));
    }

    let password_hash = hash_password(&req.new_password)?;
    state
        .with_db(move |db| db.update_password(user_id, &password_hash, Utc::now()))
        .await?;
    state.audit(Some(user_id), "password changed").await?;

    Ok(Json(MessageResponse {
        message: "password updated".into(),
    }))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<PublicUser>, ApiError> {
    let row = state
        .with_db(move |db| db.get_user_by_id(user_id))
        .await?
        .ok_or(ApiError::NotFound("user"))?;
    Ok(Json(row.public()))
}
