use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use uuid::Uuid;

use sharebridge_db::SearchFilter;
use sharebridge_types::api::{CreateDonationRequest, Paginated, UpdateDonationRequest, UpdateStatusRequest};
use sharebridge_types::models::{DonationRequest, RequestStatus};

use crate::discovery::{NearbyQuery, PageQuery, SearchQuery, paginated};
use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::state::AppState;
use crate::validate;

/// POST /requests: acceptors (and admins) post a need.
pub async fn create_request(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<CreateDonationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if !user.role.can_create_requests() {
        return Err(ApiError::forbidden("only acceptors can create requests"));
    }

    let location = match req.location {
        Some(point) => {
            point.validate()?;
            Some(point)
        }
        None => user.location,
    };

    let now = Utc::now();
    let request = DonationRequest {
        id: Uuid::new_v4(),
        owner_id: user.id,
        owner_name: user.name.clone(),
        title: validate::title(&req.title)?,
        description: validate::description(&req.description)?,
        category: req.category,
        quantity: validate::quantity(req.quantity)?,
        status: RequestStatus::Open,
        address: validate::optional("address", req.address)?,
        location,
        distance_km: None,
        created_at: now,
        updated_at: now,
    };

    let row = request.clone();
    state.with_db(move |db| db.insert_request(&row)).await?;
    state
        .audit(Some(user.id), format!("request created: {} ({})", request.id, request.title))
        .await?;

    Ok((StatusCode::CREATED, Json(request)))
}

pub async fn list_requests(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery<RequestStatus>>,
) -> Result<Json<Paginated<DonationRequest>>, ApiError> {
    let filter = query.into_filter();
    let page = filter.page;
    let (items, total) = state.with_db(move |db| db.search_requests(&filter)).await?;
    Ok(Json(paginated(items, total, &page)))
}

/// GET /requests/nearby: open needs around the caller by default.
pub async fn nearby_requests(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<NearbyQuery<RequestStatus>>,
) -> Result<Json<Paginated<DonationRequest>>, ApiError> {
    let filter = query.into_filter(&user, RequestStatus::Open)?;
    let page = filter.page;
    let (items, total) = state.with_db(move |db| db.search_requests(&filter)).await?;
    Ok(Json(paginated(items, total, &page)))
}

pub async fn my_requests(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Paginated<DonationRequest>>, ApiError> {
    let filter = SearchFilter {
        owner_id: Some(user.id),
        page: query.page_request(),
        ..Default::default()
    };
    let page = filter.page;
    let (items, total) = state.with_db(move |db| db.search_requests(&filter)).await?;
    Ok(Json(paginated(items, total, &page)))
}

pub async fn get_request(
    State(state): State<AppState>,
    Path(request_id): Path<Uuid>,
) -> Result<Json<DonationRequest>, ApiError> {
    load(&state, request_id).await.map(Json)
}

pub async fn update_request(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(request_id): Path<Uuid>,
    Json(req): Json<UpdateDonationRequest>,
) -> Result<Json<DonationRequest>, ApiError> {
    let mut request = load(&state, request_id).await?;
    user.ensure_can_modify(request.owner_id)?;

    if let Some(title) = &req.title {
        request.title = validate::title(title)?;
    }
    if let Some(description) = &req.description {
        request.description = validate::description(description)?;
    }
    if let Some(category) = req.category {
        request.category = category;
    }
    if req.quantity.is_some() {
        request.quantity = validate::quantity(req.quantity)?;
    }
    if req.address.is_some() {
        request.address = validate::optional("address", req.address)?;
    }
    if let Some(point) = req.location {
        point.validate()?;
        request.location = Some(point);
    }
    if let Some(status) = req.status {
        request.status = status;
    }
    request.updated_at = Utc::now();

    let row = request.clone();
    if !state.with_db(move |db| db.update_request(&row)).await? {
        return Err(ApiError::NotFound("request"));
    }
    state.audit(Some(user.id), format!("request updated: {request_id}")).await?;

    Ok(Json(request))
}

pub async fn update_request_status(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(request_id): Path<Uuid>,
    Json(req): Json<UpdateStatusRequest<RequestStatus>>,
) -> Result<Json<DonationRequest>, ApiError> {
    let mut request = load(&state, request_id).await?;
    user.ensure_can_modify(request.owner_id)?;

    let now = Utc::now();
    let status = req.status;
    if !state
        .with_db(move |db| db.update_request_status(request_id, status, now))
        .await?
    {
        return Err(ApiError::NotFound("request"));
    }
    state
        .audit(Some(user.id), format!("request {request_id} status: {} -> {status}", request.status))
        .await?;

    request.status = status;
    request.updated_at = now;
    Ok(Json(request))
}

pub async fn delete_request(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(request_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let request = load(&state, request_id).await?;
    user.ensure_can_modify(request.owner_id)?;

    if !state.with_db(move |db| db.delete_request(request_id)).await? {
        return Err(ApiError::NotFound("request"));
    }
    state.audit(Some(user.id), format!("request deleted: {request_id}")).await?;

    Ok(StatusCode::NO_CONTENT)
}

async fn load(state: &AppState, request_id: Uuid) -> Result<DonationRequest, ApiError> {
    state
        .with_db(move |db| db.get_request(request_id))
        .await?
        .ok_or(ApiError::NotFound("request"))
}
