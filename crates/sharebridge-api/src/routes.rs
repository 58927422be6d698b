use axum::{
    Json, Router, middleware,
    routing::{delete, get, post, put},
};

use sharebridge_types::api::HealthResponse;

use crate::middleware::{require_admin, require_auth};
use crate::state::AppState;
use crate::{admin, auth, listings, messages, requests, users};

/// Full API router. The binary adds CORS and tracing layers on top.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/auth/register", post(auth::register))
        .route("/auth/verify", post(auth::verify_email))
        .route("/auth/otp/resend", post(auth::resend_otp))
        .route("/auth/login", post(auth::login))
        .route("/auth/password/forgot", post(auth::forgot_password))
        .route("/auth/password/reset", post(auth::reset_password));

    let protected_routes = Router::new()
        .route("/users/me", get(users::me).put(users::update_me))
        .route("/users/me/password", put(users::change_password))
        .route("/users/{user_id}", get(users::get_user))
        .route("/listings", get(listings::list_listings).post(listings::create_listing))
        .route("/listings/nearby", get(listings::nearby_listings))
        .route("/listings/mine", get(listings::my_listings))
        .route(
            "/listings/{listing_id}",
            get(listings::get_listing)
                .put(listings::update_listing)
                .delete(listings::delete_listing),
        )
        .route("/listings/{listing_id}/status", put(listings::update_listing_status))
        .route("/requests", get(requests::list_requests).post(requests::create_request))
        .route("/requests/nearby", get(requests::nearby_requests))
        .route("/requests/mine", get(requests::my_requests))
        .route(
            "/requests/{request_id}",
            get(requests::get_request)
                .put(requests::update_request)
                .delete(requests::delete_request),
        )
        .route("/requests/{request_id}/status", put(requests::update_request_status))
        .route("/messages", post(messages::send_message))
        .route("/messages/conversations", get(messages::list_conversations))
        .route("/messages/with/{user_id}", get(messages::get_thread))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let admin_routes = Router::new()
        .route("/admin/users", get(admin::list_users))
        .route("/admin/users/{user_id}", delete(admin::delete_user))
        .route("/admin/users/{user_id}/role", put(admin::update_role))
        .route("/admin/logs", get(admin::list_logs))
        .route("/admin/stats", get(admin::get_stats))
        .route_layer(middleware::from_fn(require_admin))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(admin_routes)
        .with_state(state)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
