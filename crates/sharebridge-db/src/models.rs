//! Row types and column decoding helpers.
//!
//! Users get their own row type because it carries the password hash and
//! OTP state, which never leave this crate's callers unfiltered. The other
//! entities decode straight into the shared `sharebridge_types` models.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::Row;
use rusqlite::types::Type;
use uuid::Uuid;

use sharebridge_types::geo::Point;
use sharebridge_types::models::{OtpPurpose, PublicUser, Role, UserProfile};

pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub password: String,
    pub name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub role: Role,
    pub location: Option<Point>,
    pub is_verified: bool,
    pub otp_hash: Option<String>,
    pub otp_purpose: Option<OtpPurpose>,
    pub otp_expires_at: Option<DateTime<Utc>>,
    pub otp_attempts: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRow {
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            email: self.email.clone(),
            name: self.name.clone(),
            phone: self.phone.clone(),
            address: self.address.clone(),
            role: self.role,
            location: self.location,
            is_verified: self.is_verified,
            created_at: self.created_at,
        }
    }

    pub fn public(&self) -> PublicUser {
        PublicUser {
            id: self.id,
            name: self.name.clone(),
            role: self.role,
            created_at: self.created_at,
        }
    }
}

/// Insert payload for a fresh account.
pub struct NewUser {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub role: Role,
    pub location: Option<Point>,
    pub is_verified: bool,
}

pub(crate) const USER_COLUMNS: &str = "id, email, password, name, phone, address, role, latitude, longitude, \
     is_verified, otp_hash, otp_purpose, otp_expires_at, otp_attempts, created_at, updated_at";

pub(crate) fn user_from_row(row: &Row) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: uuid_col(row, 0)?,
        email: row.get(1)?,
        password: row.get(2)?,
        name: row.get(3)?,
        phone: row.get(4)?,
        address: row.get(5)?,
        role: enum_col(row, 6)?,
        location: point_cols(row, 7)?,
        is_verified: row.get(9)?,
        otp_hash: row.get(10)?,
        otp_purpose: opt_enum_col(row, 11)?,
        otp_expires_at: row.get(12)?,
        otp_attempts: row.get(13)?,
        created_at: row.get(14)?,
        updated_at: row.get(15)?,
    })
}

pub(crate) fn uuid_col(row: &Row, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn opt_uuid_col(row: &Row, idx: usize) -> rusqlite::Result<Option<Uuid>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(raw) => Uuid::parse_str(&raw)
            .map(Some)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))),
        None => Ok(None),
    }
}

pub(crate) fn enum_col<T>(row: &Row, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn opt_enum_col<T>(row: &Row, idx: usize) -> rusqlite::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match row.get::<_, Option<String>>(idx)? {
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))),
        None => Ok(None),
    }
}

/// Reads `latitude` at `idx` and `longitude` at `idx + 1`.
pub(crate) fn point_cols(row: &Row, idx: usize) -> rusqlite::Result<Option<Point>> {
    let latitude: Option<f64> = row.get(idx)?;
    let longitude: Option<f64> = row.get(idx + 1)?;
    Ok(match (latitude, longitude) {
        (Some(latitude), Some(longitude)) => Some(Point { latitude, longitude }),
        _ => None,
    })
}

pub(crate) fn split_point(point: Option<Point>) -> (Option<f64>, Option<f64>) {
    match point {
        Some(p) => (Some(p.latitude), Some(p.longitude)),
        None => (None, None),
    }
}
