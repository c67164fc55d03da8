use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;
use axum::http::HeaderName;
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::app::auth::AuthService;
use crate::domain::user::Actor;
use crate::http::AppError;
use crate::AppState;

/// Caller identity taken from a verified bearer access token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub username: String,
    pub is_admin: bool,
}

impl AuthUser {
    pub fn actor(&self) -> Actor {
        Actor {
            user_id: self.user_id,
            is_admin: self.is_admin,
        }
    }
}

/// An authenticated caller who is an admin right now.
///
/// The token's `adm` claim is confirmed against the stored role, so a
/// revoked admin loses the admin routes before their access token expires.
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

/// Operator access via the configured `x-admin-token` secret.
#[derive(Debug, Clone)]
pub struct AdminToken;

const ADMIN_TOKEN_HEADER: HeaderName = HeaderName::from_static("x-admin-token");

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::unauthorized("missing Authorization header"))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::unauthorized("invalid Authorization header"))?;

        let session = AuthService::from_state(state)
            .authenticate_access_token(token.trim())
            .map_err(|err| {
                tracing::warn!(error = ?err, "failed to authenticate access token");
                AppError::unauthorized("invalid token")
            })?
            .ok_or_else(|| AppError::unauthorized("invalid token"))?;

        Ok(AuthUser {
            user_id: session.user_id,
            username: session.username,
            is_admin: session.is_admin,
        })
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_admin {
            return Err(AppError::forbidden("admin access required"));
        }

        let stored = AuthService::from_state(state)
            .get_current_user(user.user_id)
            .await
            .map_err(|err| {
                tracing::error!(error = ?err, user_id = %user.user_id, "failed to confirm admin role");
                AppError::internal("failed to confirm admin role").with_detail(err)
            })?;
        if !stored.is_some_and(|stored| stored.is_admin) {
            tracing::warn!(user_id = %user.user_id, "stale admin claim rejected");
            return Err(AppError::forbidden("admin access required"));
        }

        Ok(AdminUser(user))
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AdminToken {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let expected = state
            .admin_token
            .as_ref()
            .ok_or_else(|| AppError::forbidden("admin token not configured"))?;

        let provided = parts
            .headers
            .get(ADMIN_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::forbidden("missing admin token"))?;

        if !bool::from(provided.as_bytes().ct_eq(expected.as_bytes())) {
            return Err(AppError::forbidden("invalid admin token"));
        }

        Ok(AdminToken)
    }
}
