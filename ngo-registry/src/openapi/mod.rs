//! OpenAPI documentation for the portal API, served at `/api/docs`.

use utoipa::{
    Modify, OpenApi,
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
};

use crate::api;
use crate::api::models::{announcements, auth, ngos, users};
use crate::types::{NgoStatus, Role, UserStatus};

/// Session cookie security scheme. The cookie name is the default from
/// [`crate::config::SessionConfig`].
struct SessionCookieAddon;

impl Modify for SessionCookieAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "session_cookie",
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::with_description(
                    "ngo_session",
                    "Session cookie set by `POST /api/auth/login` and `POST /api/auth/register`.",
                ))),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "NGO Registry API",
        description = "Public directory, NGO registration and two-tier review workflow."
    ),
    modifiers(&SessionCookieAddon),
    paths(
        api::handlers::auth::register,
        api::handlers::auth::login,
        api::handlers::auth::logout,
        api::handlers::auth::me,
        api::handlers::auth::update_me,
        api::handlers::auth::change_password,
        api::handlers::ngos::list_public_ngos,
        api::handlers::ngos::list_ngos,
        api::handlers::ngos::create_ngo,
        api::handlers::ngos::get_ngo,
        api::handlers::ngos::update_ngo,
        api::handlers::ngos::delete_ngo,
        api::handlers::ngos::update_ngo_status,
        api::handlers::users::list_users,
        api::handlers::users::update_user_status,
        api::handlers::users::update_user_role,
        api::handlers::users::delete_user,
        api::handlers::announcements::list_announcements,
        api::handlers::announcements::create_announcement,
        api::handlers::announcements::update_announcement,
        api::handlers::announcements::delete_announcement,
    ),
    components(
        schemas(
            Role,
            UserStatus,
            NgoStatus,
            auth::RegisterRequest,
            auth::LoginRequest,
            auth::ChangePasswordRequest,
            auth::AuthResponse,
            auth::AuthSuccessResponse,
            users::UserResponse,
            users::UserUpdate,
            users::UserStatusUpdate,
            users::UserRoleUpdate,
            ngos::NgoProfile,
            ngos::NgoDetails,
            ngos::NgoCreate,
            ngos::NgoUpdate,
            ngos::NgoStatusUpdate,
            ngos::NgoResponse,
            announcements::AnnouncementCreate,
            announcements::AnnouncementUpdate,
            announcements::AnnouncementResponse,
        )
    ),
    tags(
        (name = "authentication", description = "Registration, login and the caller's own account"),
        (name = "ngos", description = "Public directory, NGO records and review decisions"),
        (name = "users", description = "Account administration"),
        (name = "announcements", description = "Portal news"),
    )
)]
pub struct ApiDoc;
