use axum::{Json, extract::State, http::HeaderMap};
use tracing::info;

use crate::{
    AppState,
    api::models::{
        auth::{
            AuthResponse, AuthSuccessResponse, ChangePasswordRequest, LoginRequest, LoginResponse, LogoutResponse, RegisterRequest,
            RegisterResponse,
        },
        users::{CurrentUser, UserResponse, UserUpdate},
    },
    auth::{
        password::{self, Argon2Params},
        session,
    },
    db::models::users::{UserCreateDBRequest, UserUpdateDBRequest},
    errors::Error,
    types::Role,
};

fn invalid_credentials() -> Error {
    Error::Unauthenticated {
        message: Some("Invalid username or password".to_string()),
    }
}

fn validate_email(email: Option<&str>) -> Result<(), Error> {
    match email {
        Some(email) if !email.contains('@') => Err(Error::BadRequest {
            message: format!("Invalid email address: {email}"),
        }),
        _ => Ok(()),
    }
}

/// Register a new account. New accounts always get the `user` role.
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    tag = "authentication",
    responses(
        (status = 201, description = "User registered successfully", body = AuthResponse),
        (status = 400, description = "Invalid input or registration disabled"),
        (status = 409, description = "Username already taken"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn register(State(state): State<AppState>, Json(request): Json<RegisterRequest>) -> Result<RegisterResponse, Error> {
    if !state.config.auth.allow_registration {
        return Err(Error::BadRequest {
            message: "User registration is disabled".to_string(),
        });
    }

    let username = request.username.trim();
    if username.is_empty() {
        return Err(Error::BadRequest {
            message: "Username is required".to_string(),
        });
    }
    validate_email(request.email.as_deref())?;
    password::validate_length(&request.password, &state.config.auth.password)?;

    let params = Argon2Params::from(&state.config.auth.password);
    let password_hash = password::hash_blocking(request.password, params).await?;

    let created_user = state
        .storage
        .create_user(&UserCreateDBRequest {
            username: username.to_string(),
            email: request.email,
            display_name: request.display_name,
            password_hash,
            role: Role::User,
        })
        .await?;
    info!(user_id = created_user.id, "Registered new account");

    let session = state.sessions.create(created_user.id);
    let cookie = session::create_session_cookie(&session.id, &state.config.auth.session);

    let auth_response = AuthResponse {
        user: UserResponse::from(created_user),
        message: "Registration successful".to_string(),
    };

    Ok(RegisterResponse { auth_response, cookie })
}

/// Login with username and password
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    tag = "authentication",
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials or suspended account"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn login(State(state): State<AppState>, Json(request): Json<LoginRequest>) -> Result<LoginResponse, Error> {
    let user = state
        .storage
        .get_user_by_username(request.username.trim())
        .await?
        .ok_or_else(invalid_credentials)?;

    let is_valid = password::verify_blocking(request.password, user.password_hash.clone()).await?;
    if !is_valid {
        return Err(invalid_credentials());
    }

    if !user.is_active() {
        return Err(Error::Unauthenticated {
            message: Some("This account has been suspended".to_string()),
        });
    }

    let session = state.sessions.create(user.id);
    let cookie = session::create_session_cookie(&session.id, &state.config.auth.session);

    let auth_response = AuthResponse {
        user: UserResponse::from(user),
        message: "Login successful".to_string(),
    };

    Ok(LoginResponse { auth_response, cookie })
}

/// Logout (destroy the session and clear the cookie)
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    tag = "authentication",
    responses(
        (status = 200, description = "Logout successful", body = AuthSuccessResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Result<LogoutResponse, Error> {
    let session_config = &state.config.auth.session;
    let session_id = headers
        .get(axum::http::header::COOKIE)
        .and_then(|value| value.to_str().ok())
        .and_then(|cookies| session::session_id_from_cookie_header(cookies, &session_config.cookie_name));
    if let Some(session_id) = session_id {
        state.sessions.destroy(session_id);
    }

    let auth_response = AuthSuccessResponse {
        message: "Logout successful".to_string(),
    };
    Ok(LogoutResponse {
        auth_response,
        cookie: session::clear_session_cookie(session_config),
    })
}

/// Get the signed-in user's account
#[utoipa::path(
    get,
    path = "/api/auth/me",
    tag = "authentication",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Not signed in"),
    ),
    security(("session_cookie" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn me(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<UserResponse>, Error> {
    let user = state
        .storage
        .get_user(current_user.id)
        .await?
        .ok_or(Error::Unauthenticated { message: None })?;
    Ok(Json(UserResponse::from(user)))
}

/// Update the signed-in user's email and display name
#[utoipa::path(
    patch,
    path = "/api/auth/me",
    request_body = UserUpdate,
    tag = "authentication",
    responses(
        (status = 200, description = "Profile updated", body = UserResponse),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Not signed in"),
    ),
    security(("session_cookie" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_me(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(update): Json<UserUpdate>,
) -> Result<Json<UserResponse>, Error> {
    validate_email(update.email.as_deref())?;
    let user = state
        .storage
        .update_user(current_user.id, &UserUpdateDBRequest::new(update))
        .await?;
    Ok(Json(UserResponse::from(user)))
}

/// Change password for the signed-in user.
///
/// Every other session of the account is signed out; the caller gets a fresh session.
#[utoipa::path(
    post,
    path = "/api/auth/password-change",
    request_body = ChangePasswordRequest,
    tag = "authentication",
    responses(
        (status = 200, description = "Password changed successfully", body = AuthResponse),
        (status = 400, description = "New password does not meet the length rules"),
        (status = 401, description = "Current password is incorrect"),
    ),
    security(("session_cookie" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn change_password(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<LoginResponse, Error> {
    let user = state
        .storage
        .get_user(current_user.id)
        .await?
        .ok_or(Error::Unauthenticated { message: None })?;

    let is_valid = password::verify_blocking(request.current_password, user.password_hash).await?;
    if !is_valid {
        return Err(Error::Unauthenticated {
            message: Some("Current password is incorrect".to_string()),
        });
    }

    password::validate_length(&request.new_password, &state.config.auth.password)?;
    let params = Argon2Params::from(&state.config.auth.password);
    let new_password_hash = password::hash_blocking(request.new_password, params).await?;

    let updated = state
        .storage
        .update_user(current_user.id, &UserUpdateDBRequest::password_hash(new_password_hash))
        .await?;

    let revoked = state.sessions.revoke_user(current_user.id);
    info!(user_id = current_user.id, revoked, "Password changed, sessions revoked");

    let session = state.sessions.create(current_user.id);
    let cookie = session::create_session_cookie(&session.id, &state.config.auth.session);

    Ok(LoginResponse {
        auth_response: AuthResponse {
            user: UserResponse::from(updated),
            message: "Password changed successfully".to_string(),
        },
        cookie,
    })
}
