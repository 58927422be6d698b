use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use uuid::Uuid;

use sharebridge_db::SearchFilter;
use sharebridge_types::api::{CreateListingRequest, Paginated, UpdateListingRequest, UpdateStatusRequest};
use sharebridge_types::models::{Listing, ListingStatus};

use crate::discovery::{NearbyQuery, PageQuery, SearchQuery, paginated};
use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::state::AppState;
use crate::validate;

/// POST /listings: donors (and admins) offer an item.
pub async fn create_listing(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<CreateListingRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if !user.role.can_create_listings() {
        return Err(ApiError::forbidden("only donors can create listings"));
    }

    let location = match req.location {
        Some(point) => {
            point.validate()?;
            Some(point)
        }
        None => user.location,
    };

    let now = Utc::now();
    let listing = Listing {
        id: Uuid::new_v4(),
        owner_id: user.id,
        owner_name: user.name.clone(),
        title: validate::title(&req.title)?,
        description: validate::description(&req.description)?,
        category: req.category,
        status: ListingStatus::Active,
        image_url: validate::optional("image_url", req.image_url)?,
        address: validate::optional("address", req.address)?,
        location,
        distance_km: None,
        created_at: now,
        updated_at: now,
    };

    let row = listing.clone();
    state.with_db(move |db| db.insert_listing(&row)).await?;
    state
        .audit(Some(user.id), format!("listing created: {} ({})", listing.id, listing.title))
        .await?;

    Ok((StatusCode::CREATED, Json(listing)))
}

/// GET /listings: filtered browse, newest first.
pub async fn list_listings(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery<ListingStatus>>,
) -> Result<Json<Paginated<Listing>>, ApiError> {
    let filter = query.into_filter();
    let page = filter.page;
    let (items, total) = state.with_db(move |db| db.search_listings(&filter)).await?;
    Ok(Json(paginated(items, total, &page)))
}

/// GET /listings/nearby: proximity search, nearest first.
pub async fn nearby_listings(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<NearbyQuery<ListingStatus>>,
) -> Result<Json<Paginated<Listing>>, ApiError> {
    let filter = query.into_filter(&user, ListingStatus::Active)?;
    let page = filter.page;
    let (items, total) = state.with_db(move |db| db.search_listings(&filter)).await?;
    Ok(Json(paginated(items, total, &page)))
}

/// GET /listings/mine
pub async fn my_listings(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Paginated<Listing>>, ApiError> {
    let filter = SearchFilter {
        owner_id: Some(user.id),
        page: query.page_request(),
        ..Default::default()
    };
    let page = filter.page;
    let (items, total) = state.with_db(move |db| db.search_listings(&filter)).await?;
    Ok(Json(paginated(items, total, &page)))
}

pub async fn get_listing(
    State(state): State<AppState>,
    Path(listing_id): Path<Uuid>,
) -> Result<Json<Listing>, ApiError> {
    load(&state, listing_id).await.map(Json)
}

/// PUT /listings/{id}: partial update by owner or admin. Last write wins.
pub async fn update_listing(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(listing_id): Path<Uuid>,
    Json(req): Json<UpdateListingRequest>,
) -> Result<Json<Listing>, ApiError> {
    let mut listing = load(&state, listing_id).await?;
    user.ensure_can_modify(listing.owner_id)?;

    if let Some(title) = &req.title {
        listing.title = validate::title(title)?;
    }
    if let Some(description) = &req.description {
        listing.description = validate::description(description)?;
    }
    if let Some(category) = req.category {
        listing.category = category;
    }
    if req.image_url.is_some() {
        listing.image_url = validate::optional("image_url", req.image_url)?;
    }
    if req.address.is_some() {
        listing.address = validate::optional("address", req.address)?;
    }
    if let Some(point) = req.location {
        point.validate()?;
        listing.location = Some(point);
    }
    if let Some(status) = req.status {
        listing.status = status;
    }
    listing.updated_at = Utc::now();

    let row = listing.clone();
    if !state.with_db(move |db| db.update_listing(&row)).await? {
        return Err(ApiError::NotFound("listing"));
    }
    state.audit(Some(user.id), format!("listing updated: {listing_id}")).await?;

    Ok(Json(listing))
}

/// PUT /listings/{id}/status
pub async fn update_listing_status(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(listing_id): Path<Uuid>,
    Json(req): Json<UpdateStatusRequest<ListingStatus>>,
) -> Result<Json<Listing>, ApiError> {
    let mut listing = load(&state, listing_id).await?;
    user.ensure_can_modify(listing.owner_id)?;

    let now = Utc::now();
    let status = req.status;
    if !state
        .with_db(move |db| db.update_listing_status(listing_id, status, now))
        .await?
    {
        return Err(ApiError::NotFound("listing"));
    }
    state
        .audit(Some(user.id), format!("listing {listing_id} status: {} -> {status}", listing.status))
        .await?;

    listing.status = status;
    listing.updated_at = now;
    Ok(Json(listing))
}

pub async fn delete_listing(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(listing_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let listing = load(&state, listing_id).await?;
    user.ensure_can_modify(listing.owner_id)?;

    if !state.with_db(move |db| db.delete_listing(listing_id)).await? {
        return Err(ApiError::NotFound("listing"));
    }
    state.audit(Some(user.id), format!("listing deleted: {listing_id}")).await?;

    Ok(StatusCode::NO_CONTENT)
}

async fn load(state: &AppState, listing_id: Uuid) -> Result<Listing, ApiError> {
    state
        .with_db(move |db| db.get_listing(listing_id))
        .await?
        .ok_or(ApiError::NotFound("listing"))
}
