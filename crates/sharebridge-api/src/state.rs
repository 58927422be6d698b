use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info};
use uuid::Uuid;

use sharebridge_db::Database;

use crate::config::Config;
use crate::error::ApiError;
use crate::mailer::Mailer;

/// Shared application state for all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub config: Arc<Config>,
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    pub fn new(db: Database, config: Config, mailer: Arc<dyn Mailer>) -> Self {
        Self {
            db: Arc::new(db),
            config: Arc::new(config),
            mailer,
        }
    }

    /// Runs blocking DB work off the async runtime.
    pub async fn with_db<F, T>(&self, f: F) -> Result<T, ApiError>
    where
        F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| {
                error!("spawn_blocking join error: {}", e);
                ApiError::Internal(anyhow::anyhow!("blocking task failed"))
            })?
            .map_err(ApiError::Internal)
    }

    /// Appends a row to the audit log.
    pub async fn audit(&self, user_id: Option<Uuid>, action: impl Into<String>) -> Result<(), ApiError> {
        let action = action.into();
        info!(user_id = ?user_id, "audit: {}", action);
        self.with_db(move |db| db.append_log(user_id, &action, Utc::now())).await?;
        Ok(())
    }
}
