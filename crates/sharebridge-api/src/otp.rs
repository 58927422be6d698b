//! One-time passcodes for email verification and password reset.

use chrono::{DateTime, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};

use sharebridge_db::UserRow;
use sharebridge_types::models::OtpPurpose;

pub const OTP_DIGITS: usize = 6;

/// Wrong guesses allowed before the pending code is thrown away.
pub const MAX_ATTEMPTS: u32 = 5;

#[derive(Debug, PartialEq)]
pub enum OtpError {
    /// Nothing pending for this purpose (never issued, consumed, or burned).
    Missing,
    Expired,
    Mismatch,
}

pub fn generate() -> String {
    let code: u32 = rand::rng().random_range(0..1_000_000);
    format!("{code:0width$}", width = OTP_DIGITS)
}

/// Only the hash is stored.
pub fn hash(code: &str) -> String {
    hex::encode(Sha256::digest(code.trim().as_bytes()))
}

pub fn check(user: &UserRow, purpose: OtpPurpose, code: &str, now: DateTime<Utc>) -> Result<(), OtpError> {
    let (Some(stored), Some(stored_purpose), Some(expires_at)) =
        (&user.otp_hash, user.otp_purpose, user.otp_expires_at)
    else {
        return Err(OtpError::Missing);
    };

    if stored_purpose != purpose || user.otp_attempts >= MAX_ATTEMPTS {
        return Err(OtpError::Missing);
    }
    if now > expires_at {
        return Err(OtpError::Expired);
    }
    if hash(code) != *stored {
        return Err(OtpError::Mismatch);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use sharebridge_types::models::Role;
    use uuid::Uuid;

    fn user_with_otp(code: &str, purpose: OtpPurpose, expires_at: DateTime<Utc>) -> UserRow {
        let now = Utc::now();
        UserRow {
            id: Uuid::new_v4(),
            email: "a@b.org".into(),
            password: String::new(),
            name: "A".into(),
            phone: None,
            address: None,
            role: Role::Donor,
            location: None,
            is_verified: false,
            otp_hash: Some(hash(code)),
            otp_purpose: Some(purpose),
            otp_expires_at: Some(expires_at),
            otp_attempts: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn generated_codes_are_six_digits() {
        for _ in 0..50 {
            let code = generate();
            assert_eq!(code.len(), OTP_DIGITS);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn hash_is_hex_sha256_and_ignores_whitespace() {
        assert_eq!(hash("123456").len(), 64);
        assert_eq!(hash(" 123456 "), hash("123456"));
        assert_ne!(hash("123456"), hash("654321"));
    }

    #[test]
    fn accepts_matching_code() {
        let now = Utc::now();
        let user = user_with_otp("042042", OtpPurpose::VerifyEmail, now + Duration::minutes(5));
        assert_eq!(check(&user, OtpPurpose::VerifyEmail, "042042", now), Ok(()));
    }

    #[test]
    fn rejects_wrong_code_purpose_and_expiry() {
        let now = Utc::now();
        let user = user_with_otp("111111", OtpPurpose::VerifyEmail, now + Duration::minutes(5));
        assert_eq!(check(&user, OtpPurpose::VerifyEmail, "222222", now), Err(OtpError::Mismatch));
        assert_eq!(check(&user, OtpPurpose::ResetPassword, "111111", now), Err(OtpError::Missing));
        assert_eq!(
            check(&user, OtpPurpose::VerifyEmail, "111111", now + Duration::minutes(6)),
            Err(OtpError::Expired)
        );
    }

    #[test]
    fn burned_after_too_many_attempts() {
        let now = Utc::now();
        let mut user = user_with_otp("111111", OtpPurpose::VerifyEmail, now + Duration::minutes(5));
        user.otp_attempts = MAX_ATTEMPTS;
        assert_eq!(check(&user, OtpPurpose::VerifyEmail, "111111", now), Err(OtpError::Missing));
    }

    #[test]
    fn nothing_pending() {
        let now = Utc::now();
        let mut user = user_with_otp("111111", OtpPurpose::VerifyEmail, now);
        user.otp_hash = None;
        assert_eq!(check(&user, OtpPurpose::VerifyEmail, "111111", now), Err(OtpError::Missing));
    }
}
