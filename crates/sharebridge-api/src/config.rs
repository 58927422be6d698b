use std::{env, fmt::Display, path::PathBuf, str::FromStr};

use anyhow::{Context, Result, bail};
use tracing::info;

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub jwt_ttl_hours: i64,
    pub otp_ttl_minutes: i64,
    /// HTTP endpoint of a transactional mail relay. Unset: mail is logged only.
    pub mail_relay_url: Option<String>,
    pub mail_api_key: Option<String>,
    pub mail_from: String,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
    /// Allowed browser origin. Unset: any origin.
    pub cors_origin: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 3000,
            db_path: "sharebridge.db".into(),
            jwt_secret: String::new(),
            jwt_ttl_hours: 24,
            otp_ttl_minutes: 10,
            mail_relay_url: None,
            mail_api_key: None,
            mail_from: "no-reply@sharebridge.local".into(),
            admin_email: None,
            admin_password: None,
            cors_origin: None,
        }
    }
}

impl Config {
    /// Reads `SHAREBRIDGE_*` variables. Call after `dotenvy::dotenv()`.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let jwt_secret = optional("SHAREBRIDGE_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("SHAREBRIDGE_JWT_SECRET is unset or still a placeholder");
        }

        let config = Self {
            host: optional("SHAREBRIDGE_HOST").unwrap_or(defaults.host),
            port: parse_or("SHAREBRIDGE_PORT", defaults.port)?,
            db_path: optional("SHAREBRIDGE_DB_PATH").map(PathBuf::from).unwrap_or(defaults.db_path),
            jwt_secret,
            jwt_ttl_hours: parse_or("SHAREBRIDGE_JWT_TTL_HOURS", defaults.jwt_ttl_hours)?,
            otp_ttl_minutes: parse_or("SHAREBRIDGE_OTP_TTL_MINUTES", defaults.otp_ttl_minutes)?,
            mail_relay_url: optional("SHAREBRIDGE_MAIL_RELAY_URL"),
            mail_api_key: optional("SHAREBRIDGE_MAIL_API_KEY"),
            mail_from: optional("SHAREBRIDGE_MAIL_FROM").unwrap_or(defaults.mail_from),
            admin_email: optional("SHAREBRIDGE_ADMIN_EMAIL"),
            admin_password: optional("SHAREBRIDGE_ADMIN_PASSWORD"),
            cors_origin: optional("SHAREBRIDGE_CORS_ORIGIN"),
        };

        if config.jwt_ttl_hours <= 0 || config.otp_ttl_minutes <= 0 {
            bail!("token and OTP lifetimes must be positive");
        }

        Ok(config)
    }
}

/// Set and non-blank, trimmed.
fn optional(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr + Display,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional(key) {
        Some(raw) => raw.parse().with_context(|| format!("invalid {key} value '{raw}'")),
        None => {
            info!("{key} not set, using default: {default}");
            Ok(default)
        }
    }
}
