use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{OptionalExtension, params, params_from_iter};
use uuid::Uuid;

use sharebridge_types::geo::Point;
use sharebridge_types::models::{OtpPurpose, Role};

use super::page_params;
use crate::Database;
use crate::filter::{PageRequest, WhereClause, like_pattern};
use crate::models::{NewUser, USER_COLUMNS, UserRow, split_point, user_from_row};

impl Database {
    /// Inserts the account. Returns false when the email is already taken,
    /// which also covers two registrations racing for the same address.
    pub fn create_user(&self, user: &NewUser, now: DateTime<Utc>) -> Result<bool> {
        let (latitude, longitude) = split_point(user.location);
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT INTO users (id, email, password, name, phone, address, role, latitude, longitude,
                                    is_verified, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)",
                params![
                    user.id.to_string(),
                    user.email,
                    user.password_hash,
                    user.name,
                    user.phone,
                    user.address,
                    user.role.as_str(),
                    latitude,
                    longitude,
                    user.is_verified,
                    now,
                ],
            );
            match inserted {
                Ok(_) => Ok(true),
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
                {
                    Ok(false)
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
                    [email.trim()],
                    user_from_row,
                )
                .optional()?;
            Ok(row)
        })
    }

    pub fn get_user_by_id(&self, id: Uuid) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                    [id.to_string()],
                    user_from_row,
                )
                .optional()?;
            Ok(row)
        })
    }

    pub fn user_exists(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let exists = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1)",
                [id.to_string()],
                |row| row.get(0),
            )?;
            Ok(exists)
        })
    }

    // -- OTP state --

    /// Stores a fresh OTP hash, replacing any previous code and resetting the
    /// attempt counter.
    pub fn set_otp(
        &self,
        user_id: Uuid,
        otp_hash: &str,
        purpose: OtpPurpose,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET otp_hash = ?2, otp_purpose = ?3, otp_expires_at = ?4, otp_attempts = 0
                 WHERE id = ?1",
                params![user_id.to_string(), otp_hash, purpose.as_str(), expires_at],
            )?;
            Ok(())
        })
    }

    /// Bumps the failed-attempt counter and returns the new value.
    pub fn record_otp_failure(&self, user_id: Uuid) -> Result<u32> {
        self.with_conn(|conn| {
            let attempts = conn.query_row(
                "UPDATE users SET otp_attempts = otp_attempts + 1 WHERE id = ?1 RETURNING otp_attempts",
                [user_id.to_string()],
                |row| row.get(0),
            )?;
            Ok(attempts)
        })
    }

    pub fn clear_otp(&self, user_id: Uuid) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET otp_hash = NULL, otp_purpose = NULL, otp_expires_at = NULL, otp_attempts = 0
                 WHERE id = ?1",
                [user_id.to_string()],
            )?;
            Ok(())
        })
    }

    /// Marks the account verified and consumes the OTP.
    pub fn mark_verified(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET is_verified = 1, otp_hash = NULL, otp_purpose = NULL,
                                  otp_expires_at = NULL, otp_attempts = 0, updated_at = ?2
                 WHERE id = ?1",
                params![user_id.to_string(), now],
            )?;
            Ok(())
        })
    }

    /// Replaces the password hash and consumes any pending OTP.
    pub fn update_password(&self, user_id: Uuid, password_hash: &str, now: DateTime<Utc>) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET password = ?2, otp_hash = NULL, otp_purpose = NULL,
                                  otp_expires_at = NULL, otp_attempts = 0, updated_at = ?3
                 WHERE id = ?1",
                params![user_id.to_string(), password_hash, now],
            )?;
            Ok(())
        })
    }

    // -- Profile --

    pub fn update_profile(
        &self,
        user_id: Uuid,
        name: &str,
        phone: Option<&str>,
        address: Option<&str>,
        location: Option<Point>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let (latitude, longitude) = split_point(location);
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET name = ?2, phone = ?3, address = ?4, latitude = ?5, longitude = ?6,
                                  updated_at = ?7
                 WHERE id = ?1",
                params![user_id.to_string(), name, phone, address, latitude, longitude, now],
            )?;
            Ok(())
        })
    }

    // -- Admin --

    /// Returns false when no such user exists.
    pub fn update_role(&self, user_id: Uuid, role: Role, now: DateTime<Utc>) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET role = ?2, updated_at = ?3 WHERE id = ?1",
                params![user_id.to_string(), role.as_str(), now],
            )?;
            Ok(changed > 0)
        })
    }

    /// Deletes the user; listings, requests and messages cascade, log rows
    /// are kept with a NULL user.
    pub fn delete_user(&self, user_id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM users WHERE id = ?1", [user_id.to_string()])?;
            Ok(changed > 0)
        })
    }

    pub fn list_users(
        &self,
        role: Option<Role>,
        text: Option<&str>,
        page: &PageRequest,
    ) -> Result<(Vec<UserRow>, u64)> {
        let mut clause = WhereClause::default();
        if let Some(role) = role {
            clause.push("role = ?", [Value::Text(role.as_str().into())]);
        }
        if let Some(text) = text.map(str::trim).filter(|t| !t.is_empty()) {
            let pattern = like_pattern(text);
            clause.push(
                "(casefold(name) LIKE ? ESCAPE '\\' OR casefold(email) LIKE ? ESCAPE '\\')",
                [Value::Text(pattern.clone()), Value::Text(pattern)],
            );
        }

        self.with_conn(|conn| {
            let where_sql = clause.sql();
            let total: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM users {where_sql}"),
                params_from_iter(clause.params.iter()),
                |row| row.get(0),
            )?;

            let mut stmt = conn.prepare(&format!(
                "SELECT {USER_COLUMNS} FROM users {where_sql}
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT ? OFFSET ?"
            ))?;
            let rows = stmt
                .query_map(params_from_iter(page_params(clause.params.clone(), page)), user_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok((rows, total as u64))
        })
    }

    pub fn count_users_by_role(&self) -> Result<Vec<(Role, u64)>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT role, COUNT(*) FROM users GROUP BY role")?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((crate::models::enum_col::<Role>(row, 0)?, row.get::<_, i64>(1)? as u64))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::test_support::{db, user};

    #[test]
    fn email_lookup_is_case_insensitive() {
        let db = db();
        let id = user(&db, "Maya", Role::Donor, None);
        let row = db.get_user_by_email("MAYA@example.org").unwrap().unwrap();
        assert_eq!(row.id, id);
        assert!(db.get_user_by_email("nobody@example.org").unwrap().is_none());
    }

    #[test]
    fn duplicate_email_is_rejected() {
        let db = db();
        user(&db, "Maya", Role::Donor, None);
        let dup = NewUser {
            id: Uuid::new_v4(),
            email: "maya@EXAMPLE.org".into(),
            password_hash: "x".into(),
            name: "Other".into(),
            phone: None,
            address: None,
            role: Role::Acceptor,
            location: None,
            is_verified: false,
        };
        assert!(!db.create_user(&dup, Utc::now()).unwrap());
        assert_eq!(db.list_users(None, None, &PageRequest::default()).unwrap().1, 1);
    }

    #[test]
    fn otp_lifecycle() {
        let db = db();
        let id = user(&db, "Ravi", Role::Acceptor, None);
        let expires = Utc::now() + chrono::Duration::minutes(10);
        db.set_otp(id, "abc", OtpPurpose::ResetPassword, expires).unwrap();

        let row = db.get_user_by_id(id).unwrap().unwrap();
        assert_eq!(row.otp_hash.as_deref(), Some("abc"));
        assert_eq!(row.otp_purpose, Some(OtpPurpose::ResetPassword));
        assert_eq!(row.otp_expires_at.map(|t| t.timestamp()), Some(expires.timestamp()));

        assert_eq!(db.record_otp_failure(id).unwrap(), 1);
        assert_eq!(db.record_otp_failure(id).unwrap(), 2);

        db.update_password(id, "new-hash", Utc::now()).unwrap();
        let row = db.get_user_by_id(id).unwrap().unwrap();
        assert_eq!(row.password, "new-hash");
        assert!(row.otp_hash.is_none());
        assert_eq!(row.otp_attempts, 0);
    }

    #[test]
    fn profile_update_round_trips_location() {
        let db = db();
        let id = user(&db, "Lena", Role::Donor, None);
        let spot = Point::new(52.52, 13.405).unwrap();
        db.update_profile(id, "Lena K", Some("555"), None, Some(spot), Utc::now()).unwrap();
        let row = db.get_user_by_id(id).unwrap().unwrap();
        assert_eq!(row.name, "Lena K");
        assert_eq!(row.location, Some(spot));

        db.update_profile(id, "Lena K", None, None, None, Utc::now()).unwrap();
        assert!(db.get_user_by_id(id).unwrap().unwrap().location.is_none());
    }

    #[test]
    fn list_users_filters_and_pages() {
        let db = db();
        user(&db, "Ann", Role::Donor, None);
        user(&db, "Bob", Role::Donor, None);
        user(&db, "Cid", Role::Acceptor, None);

        let (rows, total) = db.list_users(Some(Role::Donor), None, &PageRequest::new(Some(1), Some(1))).unwrap();
        assert_eq!(total, 2);
        assert_eq!(rows.len(), 1);

        let (rows, total) = db.list_users(None, Some("cid"), &PageRequest::default()).unwrap();
        assert_eq!(total, 1);
        assert_eq!(rows[0].name, "Cid");

        let mut counts = db.count_users_by_role().unwrap();
        counts.sort();
        assert_eq!(counts, vec![(Role::Donor, 2), (Role::Acceptor, 1)]);
    }

    #[test]
    fn role_change_and_delete_report_missing_users() {
        let db = db();
        let id = user(&db, "Dee", Role::Donor, None);
        assert!(db.update_role(id, Role::Admin, Utc::now()).unwrap());
        assert_eq!(db.get_user_by_id(id).unwrap().unwrap().role, Role::Admin);
        assert!(!db.update_role(Uuid::new_v4(), Role::Admin, Utc::now()).unwrap());

        assert!(db.delete_user(id).unwrap());
        assert!(!db.delete_user(id).unwrap());
        assert!(!db.user_exists(id).unwrap());
    }
}
