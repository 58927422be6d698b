//! Admin routes. Everything here sits behind `require_admin`.

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use sharebridge_db::{NewUser, PageRequest};
use sharebridge_types::api::{Paginated, StatsResponse, UpdateRoleRequest};
use sharebridge_types::models::{ListingStatus, LogEntry, RequestStatus, Role, UserProfile};

use crate::auth::hash_password;
use crate::discovery::paginated;
use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::state::AppState;
use crate::validate;

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub role: Option<Role>,
    pub q: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct LogQuery {
    pub user_id: Option<Uuid>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Result<Json<Paginated<UserProfile>>, ApiError> {
    let page = PageRequest::new(query.page, query.limit);
    let (rows, total) = state
        .with_db(move |db| db.list_users(query.role, query.q.as_deref(), &page))
        .await?;
    let items = rows.iter().map(|row| row.profile()).collect();
    Ok(Json(paginated(items, total, &page)))
}

pub async fn update_role(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    Path(user_id): Path<Uuid>,
    Json(req): Json<UpdateRoleRequest>,
) -> Result<Json<UserProfile>, ApiError> {
    if user_id == admin.id {
        return Err(ApiError::bad_request("admins cannot change their own role"));
    }

    let role = req.role;
    let row = state
        .with_db(move |db| {
            if !db.update_role(user_id, role, Utc::now())? {
                return Ok(None);
            }
            db.get_user_by_id(user_id)
        })
        .await?
        .ok_or(ApiError::NotFound("user"))?;

    state
        .audit(Some(admin.id), format!("role changed: {} -> {role}", row.email))
        .await?;
    Ok(Json(row.profile()))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    Path(user_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if user_id == admin.id {
        return Err(ApiError::bad_request("admins cannot delete themselves"));
    }

    let email = state
        .with_db(move |db| {
            let Some(row) = db.get_user_by_id(user_id)? else {
                return Ok(None);
            };
            db.delete_user(user_id)?;
            Ok(Some(row.email))
        })
        .await?
        .ok_or(ApiError::NotFound("user"))?;

    state
        .audit(Some(admin.id), format!("user deleted: {email} ({user_id})"))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_logs(
    State(state): State<AppState>,
    Query(query): Query<LogQuery>,
) -> Result<Json<Paginated<LogEntry>>, ApiError> {
    let page = PageRequest::new(query.page, query.limit);
    let (items, total) = state
        .with_db(move |db| db.list_logs(query.user_id, &page))
        .await?;
    Ok(Json(paginated(items, total, &page)))
}

pub async fn get_stats(State(state): State<AppState>) -> Result<Json<StatsResponse>, ApiError> {
    let stats = state
        .with_db(|db| {
            let mut stats = StatsResponse::default();
            for (role, count) in db.count_users_by_role()? {
                stats.total_users += count;
                match role {
                    Role::Donor => stats.donors = count,
                    Role::Acceptor => stats.acceptors = count,
                    Role::Admin => stats.admins = count,
                }
            }
            for (status, count) in db.count_listings_by_status()? {
                match status {
                    ListingStatus::Active => stats.listings_active = count,
                    ListingStatus::Claimed => stats.listings_claimed = count,
                    ListingStatus::Completed => stats.listings_completed = count,
                }
            }
            for (status, count) in db.count_requests_by_status()? {
                match status {
                    RequestStatus::Open => stats.requests_open = count,
                    RequestStatus::Fulfilled => stats.requests_fulfilled = count,
                    RequestStatus::Closed => stats.requests_closed = count,
                }
            }
            stats.messages = db.count_messages()?;
            Ok(stats)
        })
        .await?;
    Ok(Json(stats))
}

/// Creates the configured admin account at startup if it does not exist.
pub async fn bootstrap_admin(state: &AppState, email: &str, password: &str) -> Result<(), ApiError> {
    let email = validate::email(email)?;
    validate::password(password)?;

    let lookup = email.clone();
    if let Some(existing) = state.with_db(move |db| db.get_user_by_email(&lookup)).await? {
        if existing.role != Role::Admin {
            warn!("Bootstrap admin {} exists with role {}, leaving it alone", email, existing.role);
        }
        return Ok(());
    }

    let user = NewUser {
        id: Uuid::new_v4(),
        email: email.clone(),
        password_hash: hash_password(password)?,
        name: "Administrator".into(),
        phone: None,
        address: None,
        role: Role::Admin,
        location: None,
        is_verified: true,
    };
    let user_id = user.id;
    if !state.with_db(move |db| db.create_user(&user, Utc::now())).await? {
        warn!("Bootstrap admin {} was created concurrently, leaving it alone", email);
        return Ok(());
    }
    state.audit(Some(user_id), format!("admin bootstrapped: {email}")).await?;

    info!("Created admin account {}", email);
    Ok(())
}
