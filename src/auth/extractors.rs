use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use time::OffsetDateTime;
use tracing::warn;

use super::jwt::SessionKeys;
use crate::{
    adapter::{Adapter, AdapterSession, AdapterUser},
    error::AppError,
    state::AppState,
};

/// Caller identified by a session JWT whose database session is still live.
pub struct AuthUser {
    pub user: AdapterUser,
    pub session: AdapterSession,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".into()))?;

        let token = header
            .strip_prefix("Bearer ")
            .or_else(|| header.strip_prefix("bearer "))
            .ok_or_else(|| AppError::Unauthorized("Invalid Authorization header".into()))?;

        let keys = SessionKeys::from_ref(state);
        let claims = keys.verify(token).map_err(|_| {
            warn!("invalid or expired token");
            AppError::Unauthorized("Invalid or expired token".into())
        })?;

        let (session, user) = state
            .adapter()
            .get_session_and_user(&claims.sid)
            .await?
            .ok_or_else(|| AppError::Unauthorized("Session not found".into()))?;

        // Expired rows stay in the table; they are only refused here.
        if session.is_expired_at(OffsetDateTime::now_utc()) {
            warn!(user_id = %session.user_id, "expired session presented");
            return Err(AppError::Unauthorized("Session expired".into()));
        }
        if session.user_id != claims.sub {
            return Err(AppError::Unauthorized("Invalid or expired token".into()));
        }

        Ok(AuthUser { user, session })
    }
}
