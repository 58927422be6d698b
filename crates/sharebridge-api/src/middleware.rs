use axum::{
    Extension,
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use jsonwebtoken::{DecodingKey, Validation, decode};
use uuid::Uuid;

use sharebridge_types::api::Claims;
use sharebridge_types::geo::Point;
use sharebridge_types::models::Role;

use crate::error::ApiError;
use crate::state::AppState;

/// The caller, as currently stored (not as the token remembers them).
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub location: Option<Point>,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Owners may change their own records; admins may change anyone's.
    pub fn ensure_can_modify(&self, owner_id: Uuid) -> Result<(), ApiError> {
        if self.id == owner_id || self.is_admin() {
            Ok(())
        } else {
            Err(ApiError::forbidden("not the owner of this resource"))
        }
    }
}

pub fn decode_token(token: &str, secret: &str) -> Result<Claims, ApiError> {
    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &Validation::default())
        .map(|data| data.claims)
        .map_err(|_| ApiError::Unauthorized("invalid or expired token".into()))
}

/// Validates the bearer JWT and loads the user it names.
pub async fn require_auth(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let TypedHeader(Authorization(bearer)) =
        bearer.ok_or_else(|| ApiError::Unauthorized("missing bearer token".into()))?;

    let claims = decode_token(bearer.token(), &state.config.jwt_secret)?;

    let user_id = claims.sub;
    let user = state
        .with_db(move |db| db.get_user_by_id(user_id))
        .await?
        .ok_or_else(|| ApiError::Unauthorized("account no longer exists".into()))?;

    if !user.is_verified {
        return Err(ApiError::forbidden("email not verified"));
    }

    req.extensions_mut().insert(AuthUser {
        id: user.id,
        email: user.email,
        name: user.name,
        role: user.role,
        location: user.location,
    });
    Ok(next.run(req).await)
}

/// Must be layered inside `require_auth`.
pub async fn require_admin(
    Extension(user): Extension<AuthUser>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !user.is_admin() {
        return Err(ApiError::forbidden("admin access required"));
    }
    Ok(next.run(req).await)
}
