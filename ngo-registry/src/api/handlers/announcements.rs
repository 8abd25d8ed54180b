use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use tracing::info;

use crate::{
    AppState,
    api::models::announcements::{AnnouncementCreate, AnnouncementResponse, AnnouncementUpdate, ListAnnouncementsQuery},
    auth::current_user::{MaybeUser, RequiresAdmin},
    db::models::announcements::AnnouncementCreateDBRequest,
    errors::Error,
    types::AnnouncementId,
};

fn not_found(id: AnnouncementId) -> Error {
    Error::NotFound {
        resource: "Announcement".to_string(),
        id: id.to_string(),
    }
}

/// List announcements, newest first.
///
/// Drafts are included only when an admin asks for them with `includeDrafts=true`.
#[utoipa::path(
    get,
    path = "/api/announcements",
    tag = "announcements",
    params(ListAnnouncementsQuery),
    responses(
        (status = 200, description = "Announcements", body = [AnnouncementResponse]),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_announcements(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    Query(query): Query<ListAnnouncementsQuery>,
) -> Result<Json<Vec<AnnouncementResponse>>, Error> {
    let include_drafts = query.include_drafts && viewer.is_some_and(|u| u.is_reviewer());
    let announcements = state.storage.list_announcements(include_drafts).await?;
    Ok(Json(announcements.into_iter().map(AnnouncementResponse::from).collect()))
}

#[utoipa::path(
    post,
    path = "/api/announcements",
    tag = "announcements",
    request_body = AnnouncementCreate,
    responses(
        (status = 201, description = "Announcement created", body = AnnouncementResponse),
        (status = 400, description = "Missing title"),
        (status = 403, description = "Admin access required"),
    ),
    security(("session_cookie" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_announcement(
    State(state): State<AppState>,
    RequiresAdmin(admin): RequiresAdmin,
    Json(create): Json<AnnouncementCreate>,
) -> Result<(StatusCode, Json<AnnouncementResponse>), Error> {
    create.validate()?;
    let announcement = state
        .storage
        .create_announcement(&AnnouncementCreateDBRequest::new(admin.id, create))
        .await?;
    info!(announcement_id = announcement.id, admin_id = admin.id, "Announcement created");
    Ok((StatusCode::CREATED, Json(announcement.into())))
}

#[utoipa::path(
    put,
    path = "/api/announcements/{id}",
    tag = "announcements",
    request_body = AnnouncementUpdate,
    params(("id" = i64, Path, description = "Announcement ID")),
    responses(
        (status = 200, description = "Announcement updated", body = AnnouncementResponse),
        (status = 400, description = "Blank title"),
        (status = 403, description = "Admin access required"),
        (status = 404, description = "Not found"),
    ),
    security(("session_cookie" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_announcement(
    State(state): State<AppState>,
    RequiresAdmin(_admin): RequiresAdmin,
    Path(id): Path<AnnouncementId>,
    Json(update): Json<AnnouncementUpdate>,
) -> Result<Json<AnnouncementResponse>, Error> {
    if update.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
        return Err(Error::BadRequest {
            message: "Announcement title is required".to_string(),
        });
    }
    if state.storage.get_announcement(id).await?.is_none() {
        return Err(not_found(id));
    }
    let announcement = state.storage.update_announcement(id, &update.into()).await?;
    Ok(Json(announcement.into()))
}

#[utoipa::path(
    delete,
    path = "/api/announcements/{id}",
    tag = "announcements",
    params(("id" = i64, Path, description = "Announcement ID")),
    responses(
        (status = 200, description = "Deleted announcement", body = AnnouncementResponse),
        (status = 403, description = "Admin access required"),
        (status = 404, description = "Not found"),
    ),
    security(("session_cookie" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_announcement(
    State(state): State<AppState>,
    RequiresAdmin(_admin): RequiresAdmin,
    Path(id): Path<AnnouncementId>,
) -> Result<Json<AnnouncementResponse>, Error> {
    let announcement = state.storage.get_announcement(id).await?.ok_or_else(|| not_found(id))?;
    if !state.storage.delete_announcement(id).await? {
        return Err(not_found(id));
    }
    Ok(Json(announcement.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{create_test_server, create_test_state, create_test_user, session_cookie};
    use crate::types::Role;
    use serde_json::json;

    #[tokio::test]
    async fn test_drafts_are_admin_only() {
        let state = create_test_state();
        let server = create_test_server(&state);
        let admin = create_test_user(&state, "admin", Role::Admin).await;
        let user = create_test_user(&state, "amra", Role::User).await;
        let admin_cookie = session_cookie(&state, admin.id);

        server
            .post("/api/announcements")
            .add_header("cookie", &admin_cookie)
            .json(&json!({"title": "Call for applications", "body": "Open until June", "published": true}))
            .await
            .assert_status(StatusCode::CREATED);
        server
            .post("/api/announcements")
            .add_header("cookie", &admin_cookie)
            .json(&json!({"title": "Draft", "body": "Not yet"}))
            .await
            .assert_status(StatusCode::CREATED);

        let public: Vec<AnnouncementResponse> = server.get("/api/announcements?includeDrafts=true").await.json();
        assert_eq!(public.len(), 1);
        assert_eq!(public[0].title, "Call for applications");

        let as_user: Vec<AnnouncementResponse> = server
            .get("/api/announcements?includeDrafts=true")
            .add_header("cookie", session_cookie(&state, user.id))
            .await
            .json();
        assert_eq!(as_user.len(), 1);

        let as_admin: Vec<AnnouncementResponse> = server
            .get("/api/announcements?includeDrafts=true")
            .add_header("cookie", &admin_cookie)
            .await
            .json();
        assert_eq!(as_admin.len(), 2);
        assert_eq!(as_admin[0].title, "Draft");
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let state = create_test_state();
        let server = create_test_server(&state);
        let admin = create_test_user(&state, "admin", Role::Admin).await;
        let user = create_test_user(&state, "amra", Role::User).await;
        let admin_cookie = session_cookie(&state, admin.id);

        server
            .post("/api/announcements")
            .add_header("cookie", session_cookie(&state, user.id))
            .json(&json!({"title": "Spam", "body": "..."}))
            .await
            .assert_status(StatusCode::FORBIDDEN);
        server
            .post("/api/announcements")
            .add_header("cookie", &admin_cookie)
            .json(&json!({"title": " ", "body": "..."}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        let created: AnnouncementResponse = server
            .post("/api/announcements")
            .add_header("cookie", &admin_cookie)
            .json(&json!({"title": "Draft", "body": "Not yet"}))
            .await
            .json();

        let path = format!("/api/announcements/{}", created.id);
        let updated: AnnouncementResponse = server
            .put(&path)
            .add_header("cookie", &admin_cookie)
            .json(&json!({"published": true}))
            .await
            .json();
        assert!(updated.published);
        assert_eq!(updated.title, "Draft");

        server
            .put("/api/announcements/9999")
            .add_header("cookie", &admin_cookie)
            .json(&json!({"published": true}))
            .await
            .assert_status(StatusCode::NOT_FOUND);

        server.delete(&path).add_header("cookie", &admin_cookie).await.assert_status_ok();
        server
            .delete(&path)
            .add_header("cookie", &admin_cookie)
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}
