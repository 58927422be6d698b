use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::{Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::{error, info, warn};
use uuid::Uuid;

use sharebridge_db::{NewUser, UserRow};
use sharebridge_types::api::{
    AuthResponse, Claims, EmailRequest, LoginRequest, MessageResponse, RegisterRequest,
    RegisterResponse, ResetPasswordRequest, VerifyOtpRequest,
};
use sharebridge_types::models::{OtpPurpose, Role, UserProfile};

use crate::error::ApiError;
use crate::mailer::Mail;
use crate::otp::{self, OtpError};
use crate::state::AppState;
use crate::validate;

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = validate::email(&req.email)?;
    validate::password(&req.password)?;
    let name = validate::name(&req.name)?;
    if req.role == Role::Admin {
        return Err(ApiError::forbidden("admin accounts cannot be self-registered"));
    }
    if let Some(location) = &req.location {
        location.validate()?;
    }

    if find_by_email(&state, &email).await?.is_some() {
        return Err(ApiError::Conflict("email already registered".into()));
    }

    let user = NewUser {
        id: Uuid::new_v4(),
        email: email.clone(),
        password_hash: hash_password(&req.password)?,
        name,
        phone: validate::optional("phone", req.phone)?,
        address: validate::optional("address", req.address)?,
        role: req.role,
        location: req.location,
        is_verified: false,
    };
    let user_id = user.id;

    if !state.with_db(move |db| db.create_user(&user, Utc::now())).await? {
        return Err(ApiError::Conflict("email already registered".into()));
    }
    state.audit(Some(user_id), format!("user registered: {email} as {}", req.role)).await?;

    // The account exists from here on; a failed send is recovered with a resend.
    let message = match issue_otp(&state, user_id, &email, OtpPurpose::VerifyEmail).await {
        Ok(()) => "verification code sent",
        Err(e) => {
            warn!("Registered {} but the verification code was not sent: {}", email, e);
            "account created but the verification email could not be sent, request a new code via /auth/otp/resend"
        }
    };

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user_id,
            message: message.into(),
        }),
    ))
}

pub async fn verify_email(
    State(state): State<AppState>,
    Json(req): Json<VerifyOtpRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let email = validate::email(&req.email)?;
    let user = find_by_email(&state, &email).await?.ok_or(ApiError::NotFound("account"))?;
    if user.is_verified {
        return Err(ApiError::bad_request("account already verified"));
    }

    consume_otp(&state, &user, OtpPurpose::VerifyEmail, &req.otp).await?;

    let user_id = user.id;
    state.with_db(move |db| db.mark_verified(user_id, Utc::now())).await?;
    state.audit(Some(user_id), format!("email verified: {email}")).await?;

    let mut profile = user.profile();
    profile.is_verified = true;
    auth_response(&state, profile).map(Json)
}

pub async fn resend_otp(
    State(state): State<AppState>,
    Json(req): Json<EmailRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let email = validate::email(&req.email)?;
    let user = find_by_email(&state, &email).await?.ok_or(ApiError::NotFound("account"))?;
    if user.is_verified {
        return Err(ApiError::bad_request("account already verified"));
    }

    issue_otp(&state, user.id, &email, OtpPurpose::VerifyEmail).await?;

    Ok(Json(MessageResponse {
        message: "verification code sent".into(),
    }))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let invalid = || ApiError::Unauthorized("invalid email or password".into());

    let email = validate::email(&req.email).map_err(|_| invalid())?;
    let user = find_by_email(&state, &email).await?.ok_or_else(invalid)?;

    if !verify_password(&req.password, &user.password)? {
        warn!("Failed login for {}", email);
        return Err(invalid());
    }
    if !user.is_verified {
        return Err(ApiError::forbidden("email not verified"));
    }

    state.audit(Some(user.id), format!("user logged in: {email}")).await?;
    auth_response(&state, user.profile()).map(Json)
}

/// Always answers the same way so callers cannot learn which emails exist.
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(req): Json<EmailRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let response = Json(MessageResponse {
        message: "if the account exists, a reset code has been sent".into(),
    });

    let Ok(email) = validate::email(&req.email) else {
        return Ok(response);
    };
    let Some(user) = find_by_email(&state, &email).await? else {
        return Ok(response);
    };
    // Unverified accounts keep their pending verification code.
    if !user.is_verified {
        info!("Ignoring password reset for unverified account {}", email);
        return Ok(response);
    }

    state.audit(Some(user.id), format!("password reset requested: {email}")).await?;
    if let Err(e) = issue_otp(&state, user.id, &email, OtpPurpose::ResetPassword).await {
        error!("Could not send reset code to {}: {}", email, e);
    }

    Ok(response)
}

pub async fn reset_password(
    State(state): State<AppState>,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    validate::password(&req.new_password)?;
    let email = validate::email(&req.email)?;
    let user = find_by_email(&state, &email)
        .await?
        .ok_or_else(|| ApiError::bad_request("invalid or expired code"))?;

    consume_otp(&state, &user, OtpPurpose::ResetPassword, &req.otp).await?;

    let user_id = user.id;
    let password_hash = hash_password(&req.new_password)?;
    state
        .with_db(move |db| db.update_password(user_id, &password_hash, Utc::now()))
        .await?;
    state.audit(Some(user_id), format!("password reset: {email}")).await?;

    Ok(Json(MessageResponse {
        message: "password updated".into(),
    }))
}

// -- helpers --

async fn find_by_email(state: &AppState, email: &str) -> Result<Option<UserRow>, ApiError> {
    let email = email.to_string();
    state.with_db(move |db| db.get_user_by_email(&email)).await
}

/// Generates a code, stores its hash and emails the clear code.
pub(crate) async fn issue_otp(
    state: &AppState,
    user_id: Uuid,
    email: &str,
    purpose: OtpPurpose,
) -> Result<(), ApiError> {
    let code = otp::generate();
    let code_hash = otp::hash(&code);
    let ttl_minutes = state.config.otp_ttl_minutes;
    let expires_at = Utc::now() + Duration::minutes(ttl_minutes);

    state
        .with_db(move |db| db.set_otp(user_id, &code_hash, purpose, expires_at))
        .await?;

    let subject = match purpose {
        OtpPurpose::VerifyEmail => "Verify your ShareBridge account",
        OtpPurpose::ResetPassword => "Your ShareBridge password reset code",
    };
    let mail = Mail {
        to: email.to_string(),
        subject: subject.to_string(),
        body: format!("Your code is {code}. It expires in {ttl_minutes} minutes."),
    };

    state.mailer.send(mail).await.map_err(|e| {
        error!("Mail delivery to {} failed: {:#}", email, e);
        ApiError::Upstream("could not send email".into())
    })?;

    info!("Issued {} code for user {}", purpose, user_id);
    Ok(())
}

/// Accepts the pending code or records the failed attempt.
async fn consume_otp(
    state: &AppState,
    user: &UserRow,
    purpose: OtpPurpose,
    code: &str,
) -> Result<(), ApiError> {
    let user_id = user.id;
    match otp::check(user, purpose, code, Utc::now()) {
        Ok(()) => Ok(()),
        Err(OtpError::Missing) => Err(ApiError::bad_request("no pending code, request a new one")),
        Err(OtpError::Expired) => Err(ApiError::bad_request("code expired, request a new one")),
        Err(OtpError::Mismatch) => {
            let attempts = state.with_db(move |db| db.record_otp_failure(user_id)).await?;
            warn!("Wrong {} code for user {} (attempt {})", purpose, user_id, attempts);
            if attempts >= otp::MAX_ATTEMPTS {
                state.with_db(move |db| db.clear_otp(user_id)).await?;
                return Err(ApiError::bad_request("too many attempts, request a new code"));
            }
            Err(ApiError::bad_request("invalid or expired code"))
        }
    }
}

pub(crate) fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("password hashing failed: {e}")))?
        .to_string();
    Ok(hash)
}

/// Ok(false) on a wrong password; Err only when the stored hash is corrupt.
pub(crate) fn verify_password(password: &str, stored_hash: &str) -> Result<bool, ApiError> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("corrupt password hash: {e}")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

pub fn create_token(secret: &str, ttl_hours: i64, user: &UserProfile) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user.id,
        email: user.email.clone(),
        role: user.role,
        exp: (Utc::now() + Duration::hours(ttl_hours)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

fn auth_response(state: &AppState, user: UserProfile) -> Result<AuthResponse, ApiError> {
    let token = create_token(&state.config.jwt_secret, state.config.jwt_ttl_hours, &user)?;
    Ok(AuthResponse { token, user })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::decode_token;

    #[test]
    fn password_hash_round_trip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("wrong horse", &hash).unwrap());
        assert!(verify_password("x", "not-a-phc-string").is_err());
    }

    #[test]
    fn token_round_trip() {
        let profile = UserProfile {
            id: Uuid::new_v4(),
            email: "d@example.org".into(),
            name: "D".into(),
            phone: None,
            address: None,
            role: Role::Acceptor,
            location: None,
            is_verified: true,
            created_at: Utc::now(),
        };
        let token = create_token("s3cret", 1, &profile).unwrap();
        let claims = decode_token(&token, "s3cret").unwrap();
        assert_eq!(claims.sub, profile.id);
        assert_eq!(claims.role, Role::Acceptor);
        assert!(decode_token(&token, "other").is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let profile = UserProfile {
            id: Uuid::new_v4(),
            email: "e@example.org".into(),
            name: "E".into(),
            phone: None,
            address: None,
            role: Role::Donor,
            location: None,
            is_verified: true,
            created_at: Utc::now(),
        };
        let token = create_token("s3cret", -2, &profile).unwrap();
        assert!(decode_token(&token, "s3cret").is_err());
    }
}
