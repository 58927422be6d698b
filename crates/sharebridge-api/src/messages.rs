use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use sharebridge_types::api::{Paginated, SendMessageRequest};
use sharebridge_types::models::{Conversation, Message};

use crate::discovery::{PageQuery, paginated};
use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::state::AppState;
use crate::validate;

/// POST /messages: direct message, optionally about a listing or request.
/// Clients poll for new messages; there is no push.
pub async fn send_message(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.receiver_id == user.id {
        return Err(ApiError::bad_request("cannot message yourself"));
    }
    let content = validate::message_content(&req.content)?;

    let (receiver_id, listing_id, request_id) = (req.receiver_id, req.listing_id, req.request_id);
    let (receiver_exists, listing_exists, request_exists) = state
        .with_db(move |db| {
            let listing_exists = match listing_id {
                Some(id) => db.get_listing(id)?.is_some(),
                None => true,
            };
            let request_exists = match request_id {
                Some(id) => db.get_request(id)?.is_some(),
                None => true,
            };
            Ok((db.user_exists(receiver_id)?, listing_exists, request_exists))
        })
        .await?;

    if !receiver_exists {
        return Err(ApiError::NotFound("receiver"));
    }
    if !listing_exists {
        return Err(ApiError::NotFound("listing"));
    }
    if !request_exists {
        return Err(ApiError::NotFound("request"));
    }

    let message = Message {
        id: Uuid::new_v4(),
        sender_id: user.id,
        receiver_id,
        listing_id,
        request_id,
        content,
        is_read: false,
        created_at: Utc::now(),
    };

    let row = message.clone();
    state.with_db(move |db| db.insert_message(&row)).await?;
    state
        .audit(Some(user.id), format!("message sent: {} -> {}", user.id, receiver_id))
        .await?;

    Ok((StatusCode::CREATED, Json(message)))
}

/// GET /messages/conversations
pub async fn list_conversations(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<Conversation>>, ApiError> {
    let me = user.id;
    let conversations = state.with_db(move |db| db.list_conversations(me)).await?;
    Ok(Json(conversations))
}

/// GET /messages/with/{user_id}: one page of the thread, oldest first.
/// Reading marks the other side's messages as read.
pub async fn get_thread(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(other_id): Path<Uuid>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Paginated<Message>>, ApiError> {
    let me = user.id;
    let page = query.page_request();

    let (items, total) = state
        .with_db(move |db| {
            if !db.user_exists(other_id)? {
                return Ok(None);
            }
            let marked = db.mark_thread_read(me, other_id)?;
            if marked > 0 {
                debug!("Marked {} messages from {} as read", marked, other_id);
            }
            db.get_thread(me, other_id, &page).map(Some)
        })
        .await?
        .ok_or(ApiError::NotFound("user"))?;

    Ok(Json(paginated(items, total, &page)))
}
