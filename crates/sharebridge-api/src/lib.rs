pub mod admin;
pub mod auth;
pub mod config;
pub mod discovery;
pub mod error;
pub mod listings;
pub mod mailer;
pub mod messages;
pub mod middleware;
pub mod otp;
pub mod requests;
pub mod routes;
pub mod state;
pub mod users;
pub mod validate;

pub use config::Config;
pub use error::ApiError;
pub use routes::router;
pub use state::AppState;
