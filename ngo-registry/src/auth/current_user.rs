use crate::{
    AppState,
    api::models::users::CurrentUser,
    auth::{permissions, session},
    errors::{Error, Result},
};
use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::{instrument, trace};

/// Resolve the caller from the session cookie.
///
/// Returns `Ok(None)` when there is no cookie, the session is unknown or expired, or the
/// account has been suspended or deleted since login. In the last case every session of
/// that account is destroyed.
#[instrument(skip_all)]
async fn resolve_current_user(parts: &Parts, state: &AppState) -> Result<Option<CurrentUser>> {
    let Some(cookie_header) = parts.headers.get(axum::http::header::COOKIE) else {
        return Ok(None);
    };
    let cookie_str = cookie_header.to_str().map_err(|e| Error::BadRequest {
        message: format!("Invalid cookie header: {e}"),
    })?;

    let Some(session_id) = session::session_id_from_cookie_header(cookie_str, &state.config.auth.session.cookie_name) else {
        return Ok(None);
    };

    let Some(session) = state.sessions.resolve(session_id) else {
        trace!("Session cookie present but no live session");
        return Ok(None);
    };

    match state.storage.get_user(session.user_id).await? {
        Some(user) if user.is_active() => Ok(Some(user.into())),
        _ => {
            let revoked = state.sessions.revoke_user(session.user_id);
            trace!(user_id = session.user_id, revoked, "Revoked sessions of inactive account");
            Ok(None)
        }
    }
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        permissions::require_auth(resolve_current_user(parts, state).await?)
    }
}

/// The caller if signed in, for endpoints that anonymous visitors may also use.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<CurrentUser>);

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        Ok(MaybeUser(resolve_current_user(parts, state).await?))
    }
}

/// An admin or super admin caller.
#[derive(Debug, Clone)]
pub struct RequiresAdmin(pub CurrentUser);

impl FromRequestParts<AppState> for RequiresAdmin {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        permissions::require_admin(resolve_current_user(parts, state).await?).map(RequiresAdmin)
    }
}

/// A super admin caller.
#[derive(Debug, Clone)]
pub struct RequiresSuperAdmin(pub CurrentUser);

impl FromRequestParts<AppState> for RequiresSuperAdmin {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        permissions::require_super_admin(resolve_current_user(parts, state).await?).map(RequiresSuperAdmin)
    }
}
