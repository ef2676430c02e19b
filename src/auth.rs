//! Token issuance and the capability guard layer.
//!
//! Clients send a JWT in the `token` header whose claims carry the user id.
//! The extractors re-resolve the user from storage on every request, so a
//! role or approval change takes effect immediately. Handlers state their
//! required capability in the signature: [`Auth`] for any signed-in user,
//! [`AdminUser`] and [`OwnerUser`] for the role-gated panels.

use std::sync::Arc;

use axum::{extract::FromRequestParts, http::request::Parts};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::{
    database::Store,
    error::AppError,
    models::{Role, User},
    state::AppState,
};

pub const TOKEN_HEADER: &str = "token";

const NOT_AUTHORIZED: &str = "Not Authorized Login Again";

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub id: String,
}

pub fn issue_token(secret: &str, user_id: &str) -> Result<String, AppError> {
    encode(
        &Header::default(),
        &Claims {
            id: user_id.to_string(),
        },
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(Box::new(e)))
}

pub fn decode_token(secret: &str, token: &str) -> Result<String, AppError> {
    // Tokens carry no expiry, matching the session model the frontends expect.
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = false;
    validation.required_spec_claims.clear();

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims.id)
    .map_err(|_| AppError::Unauthorized(NOT_AUTHORIZED.to_string()))
}

/// Any authenticated user.
pub struct Auth(pub User);

impl FromRequestParts<Arc<AppState>> for Auth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(TOKEN_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized(NOT_AUTHORIZED.to_string()))?;

        let user_id = decode_token(&state.config.jwt_secret, token)?;

        let user = state
            .store
            .user(&user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        Ok(Self(user))
    }
}

/// An authenticated admin.
pub struct AdminUser(pub User);

impl FromRequestParts<Arc<AppState>> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let Auth(user) = Auth::from_request_parts(parts, state).await?;

        if user.role != Role::Admin {
            return Err(AppError::Unauthorized("You are not an admin".to_string()));
        }

        Ok(Self(user))
    }
}

/// An authenticated, admin-approved restaurant owner.
pub struct OwnerUser(pub User);

impl FromRequestParts<Arc<AppState>> for OwnerUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let Auth(user) = Auth::from_request_parts(parts, state).await?;

        if user.role != Role::RestaurantOwner {
            return Err(AppError::Unauthorized(
                "Not authorized. Restaurant owner access required.".to_string(),
            ));
        }
        if !user.is_approved {
            return Err(AppError::Unauthorized(
                "Account pending admin approval".to_string(),
            ));
        }

        Ok(Self(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_token_resolves_back_to_the_user_id() {
        let token = issue_token("top-secret", "user-42").unwrap();
        assert_eq!(decode_token("top-secret", &token).unwrap(), "user-42");
    }

    #[test]
    fn token_signed_with_another_secret_is_rejected() {
        let token = issue_token("top-secret", "user-42").unwrap();
        let err = decode_token("other-secret", &token).unwrap_err();
        assert_eq!(err.to_string(), "Not Authorized Login Again");
    }

    #[test]
    fn garbage_token_is_rejected() {
        assert!(decode_token("top-secret", "not-a-jwt").is_err());
    }
}
