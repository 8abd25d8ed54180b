use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use tracing::info;

use crate::{
    AppState,
    api::models::{
        ngos::{ListNgosQuery, NgoCreate, NgoResponse, NgoStatusUpdate, NgoUpdate, PublicDirectoryQuery},
        pagination::PaginatedResponse,
        users::CurrentUser,
    },
    approval::{self, Reviewer},
    auth::{
        current_user::{MaybeUser, RequiresAdmin},
        permissions,
    },
    db::models::ngos::{NgoCreateDBRequest, NgoDBResponse, NgoFilter, NgoUpdateDBRequest},
    errors::Error,
    types::{NgoId, NgoStatus, Operation, Role},
};

fn not_found(id: NgoId) -> Error {
    Error::NotFound {
        resource: "NGO".to_string(),
        id: id.to_string(),
    }
}

async fn load_ngo(state: &AppState, id: NgoId) -> Result<NgoDBResponse, Error> {
    state.storage.get_ngo(id).await?.ok_or_else(|| not_found(id))
}

/// Blank query parameters behave like absent ones.
fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Public directory of approved organizations
#[utoipa::path(
    get,
    path = "/api/public/ngos",
    tag = "ngos",
    params(PublicDirectoryQuery),
    responses(
        (status = 200, description = "Approved organizations, without sensitive details", body = PaginatedResponse<NgoResponse>),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_public_ngos(
    State(state): State<AppState>,
    Query(query): Query<PublicDirectoryQuery>,
) -> Result<Json<PaginatedResponse<NgoResponse>>, Error> {
    let (skip, limit) = query.pagination.params();
    let filter = NgoFilter {
        search: non_blank(query.search),
        city: non_blank(query.city),
        ..NgoFilter::with_status(NgoStatus::Approved)
    };

    let records = state.storage.get_ngos(&filter, skip, limit).await?;
    let total_count = state.storage.count_ngos(&filter).await?;

    let data = records.into_iter().map(|r| NgoResponse::for_viewer(r, None)).collect();
    Ok(Json(PaginatedResponse::new(data, total_count, skip, limit)))
}

/// List NGO records.
///
/// Admins and super admins see every record and may filter by status; other users see
/// only the records they submitted.
#[utoipa::path(
    get,
    path = "/api/ngos",
    tag = "ngos",
    params(ListNgosQuery),
    responses(
        (status = 200, description = "Page of NGO records", body = PaginatedResponse<NgoResponse>),
        (status = 401, description = "Not signed in"),
    ),
    security(("session_cookie" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_ngos(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<ListNgosQuery>,
) -> Result<Json<PaginatedResponse<NgoResponse>>, Error> {
    let (skip, limit) = query.pagination.params();
    let filter = if current_user.is_reviewer() {
        NgoFilter {
            status: query.status,
            ..Default::default()
        }
    } else {
        NgoFilter::created_by(current_user.id)
    };

    let records = state.storage.get_ngos(&filter, skip, limit).await?;
    let total_count = state.storage.count_ngos(&filter).await?;

    let data = records
        .into_iter()
        .map(|r| NgoResponse::for_viewer(r, Some(current_user.role)))
        .collect();
    Ok(Json(PaginatedResponse::new(data, total_count, skip, limit)))
}

/// Submit a new organization for review
#[utoipa::path(
    post,
    path = "/api/ngos",
    tag = "ngos",
    request_body = NgoCreate,
    responses(
        (status = 201, description = "Record submitted, status pending", body = NgoResponse),
        (status = 400, description = "Invalid profile"),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Only user accounts register organizations"),
    ),
    security(("session_cookie" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_ngo(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(create): Json<NgoCreate>,
) -> Result<(StatusCode, Json<NgoResponse>), Error> {
    if current_user.role != Role::User {
        return Err(Error::InsufficientPermissions {
            action: Operation::Create,
            resource: "NGO records".to_string(),
        });
    }
    create.profile.validate()?;

    let record = state
        .storage
        .create_ngo(&NgoCreateDBRequest::new(current_user.id, create))
        .await?;
    info!(ngo_id = record.id, user_id = current_user.id, "NGO submitted for review");

    Ok((
        StatusCode::CREATED,
        Json(NgoResponse::for_viewer(record, Some(current_user.role))),
    ))
}

/// Get a single NGO record.
///
/// Records that are not yet approved are reported as missing to everyone except their
/// owner and reviewers.
#[utoipa::path(
    get,
    path = "/api/ngos/{id}",
    tag = "ngos",
    params(("id" = i64, Path, description = "NGO record ID")),
    responses(
        (status = 200, description = "NGO record", body = NgoResponse),
        (status = 404, description = "Not found or not visible to the caller"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_ngo(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    Path(id): Path<NgoId>,
) -> Result<Json<NgoResponse>, Error> {
    let record = load_ngo(&state, id).await?;
    if !permissions::can_view_record(viewer.as_ref(), &record) {
        return Err(not_found(id));
    }
    Ok(Json(NgoResponse::for_viewer(record, viewer.map(|u| u.role))))
}

/// Replace a record's profile and details.
///
/// Reviewers may edit at any time without affecting the review. Owners may only edit an
/// approved record, which sends it back for a fresh review.
#[utoipa::path(
    put,
    path = "/api/ngos/{id}",
    tag = "ngos",
    request_body = NgoUpdate,
    params(("id" = i64, Path, description = "NGO record ID")),
    responses(
        (status = 200, description = "Record updated", body = NgoResponse),
        (status = 400, description = "Invalid profile"),
        (status = 403, description = "Not the owner, or the record is locked"),
        (status = 404, description = "Not found"),
        (status = 409, description = "Record changed concurrently"),
    ),
    security(("session_cookie" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_ngo(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<NgoId>,
    Json(update): Json<NgoUpdate>,
) -> Result<Json<NgoResponse>, Error> {
    let record = load_ngo(&state, id).await?;
    permissions::ensure_owner_or_reviewer(&current_user, &record)?;
    update.profile.validate()?;

    let reset_review = approval::review_after_edit(record.status, current_user.role)?;
    let updated = state
        .storage
        .update_ngo(id, record.status, &NgoUpdateDBRequest::new(update, reset_review))
        .await?;
    if reset_review {
        info!(ngo_id = id, "Owner edited approved NGO, sent back for review");
    }

    Ok(Json(NgoResponse::for_viewer(updated, Some(current_user.role))))
}

/// Delete an NGO record (admin only)
#[utoipa::path(
    delete,
    path = "/api/ngos/{id}",
    tag = "ngos",
    params(("id" = i64, Path, description = "NGO record ID")),
    responses(
        (status = 200, description = "Deleted record", body = NgoResponse),
        (status = 403, description = "Admin access required"),
        (status = 404, description = "Not found"),
    ),
    security(("session_cookie" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_ngo(
    State(state): State<AppState>,
    RequiresAdmin(admin): RequiresAdmin,
    Path(id): Path<NgoId>,
) -> Result<Json<NgoResponse>, Error> {
    let record = load_ngo(&state, id).await?;
    if !state.storage.delete_ngo(id).await? {
        return Err(not_found(id));
    }
    info!(ngo_id = id, admin_id = admin.id, "NGO deleted");
    Ok(Json(NgoResponse::for_viewer(record, Some(admin.role))))
}

/// Record a review decision.
///
/// Admins move pending records to `admin_approved` or `rejected`; super admins move
/// `admin_approved` records to `approved` or `rejected`. Rejections need a reason.
#[utoipa::path(
    patch,
    path = "/api/ngos/{id}/status",
    tag = "ngos",
    request_body = NgoStatusUpdate,
    params(("id" = i64, Path, description = "NGO record ID")),
    responses(
        (status = 200, description = "Decision recorded", body = NgoResponse),
        (status = 400, description = "Transition not allowed or rejection reason missing"),
        (status = 403, description = "Admin access required, or the reviewer submitted this NGO"),
        (status = 404, description = "Not found"),
        (status = 409, description = "Another reviewer decided first"),
    ),
    security(("session_cookie" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_ngo_status(
    State(state): State<AppState>,
    RequiresAdmin(reviewer): RequiresAdmin,
    Path(id): Path<NgoId>,
    Json(request): Json<NgoStatusUpdate>,
) -> Result<Json<NgoResponse>, Error> {
    let record = load_ngo(&state, id).await?;

    let update = approval::transition(
        &record,
        &Reviewer {
            id: reviewer.id,
            role: reviewer.role,
        },
        request.status,
        request.rejection_reason.as_deref(),
        Utc::now(),
    )?;

    let updated = state.storage.update_ngo_approval(id, record.status, &update).await?;
    info!(
        ngo_id = id,
        reviewer_id = reviewer.id,
        from = %record.status,
        to = %updated.status,
        "NGO review decision recorded"
    );

    Ok(Json(NgoResponse::for_viewer(updated, Some(reviewer.role))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::users::UserUpdateDBRequest;
    use crate::test_utils::{create_test_server, create_test_state, create_test_user, sample_ngo_create, session_cookie};
    use serde_json::{Value, json};

    struct Fixture {
        state: AppState,
        server: axum_test::TestServer,
        owner: String,
        stranger: String,
        admin: String,
        super_admin: String,
    }

    async fn fixture() -> Fixture {
        let state = create_test_state();
        let server = create_test_server(&state);
        let owner = create_test_user(&state, "owner", Role::User).await;
        let stranger = create_test_user(&state, "stranger", Role::User).await;
        let admin = create_test_user(&state, "admin", Role::Admin).await;
        let super_admin = create_test_user(&state, "root", Role::SuperAdmin).await;
        Fixture {
            owner: session_cookie(&state, owner.id),
            stranger: session_cookie(&state, stranger.id),
            admin: session_cookie(&state, admin.id),
            super_admin: session_cookie(&state, super_admin.id),
            state,
            server,
        }
    }

    async fn submit(f: &Fixture, name: &str, city: &str) -> NgoResponse {
        let response = f
            .server
            .post("/api/ngos")
            .add_header("cookie", &f.owner)
            .json(&sample_ngo_create(name, city))
            .await;
        response.assert_status(StatusCode::CREATED);
        response.json()
    }

    async fn set_status(f: &Fixture, cookie: &str, id: NgoId, body: Value) -> axum_test::TestResponse {
        f.server
            .patch(&format!("/api/ngos/{id}/status"))
            .add_header("cookie", cookie)
            .json(&body)
            .await
    }

    async fn approve_fully(f: &Fixture, id: NgoId) {
        set_status(f, &f.admin, id, json!({"status": "admin_approved"}))
            .await
            .assert_status_ok();
        set_status(f, &f.super_admin, id, json!({"status": "approved"}))
            .await
            .assert_status_ok();
    }

    #[tokio::test]
    async fn test_create_requires_user_role() {
        let f = fixture().await;

        let created = submit(&f, "Green Valley", "Sarajevo").await;
        assert_eq!(created.status, NgoStatus::Pending);
        assert!(created.details.is_none());

        let response = f
            .server
            .post("/api/ngos")
            .add_header("cookie", &f.admin)
            .json(&sample_ngo_create("Admin Org", "Mostar"))
            .await;
        response.assert_status(StatusCode::FORBIDDEN);

        let response = f.server.post("/api/ngos").json(&sample_ngo_create("Anon", "Mostar")).await;
        response.assert_status(StatusCode::UNAUTHORIZED);

        let mut invalid = sample_ngo_create("", "Mostar");
        invalid.profile.name = " ".to_string();
        let response = f.server.post("/api/ngos").add_header("cookie", &f.owner).json(&invalid).await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_two_tier_approval() {
        let f = fixture().await;
        let ngo = submit(&f, "Green Valley", "Sarajevo").await;

        let response = set_status(&f, &f.super_admin, ngo.id, json!({"status": "approved"})).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["message"], "An admin must approve this NGO first");

        let response = set_status(&f, &f.admin, ngo.id, json!({"status": "admin_approved"})).await;
        response.assert_status_ok();
        let body: NgoResponse = response.json();
        assert_eq!(body.status, NgoStatus::AdminApproved);
        assert!(body.approved_by_admin_id.is_some());
        assert!(body.approved_by_super_admin_id.is_none());
        assert!(body.details.is_some());

        let response = set_status(&f, &f.admin, ngo.id, json!({"status": "approved"})).await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let response = set_status(&f, &f.super_admin, ngo.id, json!({"status": "approved"})).await;
        response.assert_status_ok();
        let body: NgoResponse = response.json();
        assert_eq!(body.status, NgoStatus::Approved);
        assert!(body.approved_by_admin_id.is_some());
        assert!(body.approved_by_super_admin_id.is_some());
        assert!(body.rejected_by_id.is_none());
    }

    #[tokio::test]
    async fn test_rejection_requires_reason() {
        let f = fixture().await;
        let ngo = submit(&f, "Green Valley", "Sarajevo").await;

        let response = set_status(&f, &f.admin, ngo.id, json!({"status": "rejected", "rejectionReason": "  "})).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let record = f.state.storage.get_ngo(ngo.id).await.unwrap().unwrap();
        assert_eq!(record.status, NgoStatus::Pending);

        let response = set_status(
            &f,
            &f.admin,
            ngo.id,
            json!({"status": "rejected", "rejectionReason": "Missing statute"}),
        )
        .await;
        response.assert_status_ok();
        let body: NgoResponse = response.json();
        assert_eq!(body.status, NgoStatus::Rejected);
        assert_eq!(body.rejection_reason.as_deref(), Some("Missing statute"));
        assert!(body.approved_by_admin_id.is_none());
    }

    #[tokio::test]
    async fn test_regular_users_cannot_review() {
        let f = fixture().await;
        let ngo = submit(&f, "Green Valley", "Sarajevo").await;

        let response = set_status(&f, &f.owner, ngo.id, json!({"status": "admin_approved"})).await;
        response.assert_status(StatusCode::FORBIDDEN);

        let response = set_status(&f, &f.admin, 9999, json!({"status": "admin_approved"})).await;
        response.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_visibility_of_records_and_details() {
        let f = fixture().await;
        let ngo = submit(&f, "Green Valley", "Sarajevo").await;
        let path = format!("/api/ngos/{}", ngo.id);

        f.server.get(&path).await.assert_status(StatusCode::NOT_FOUND);
        f.server
            .get(&path)
            .add_header("cookie", &f.stranger)
            .await
            .assert_status(StatusCode::NOT_FOUND);

        let owner_view: Value = f.server.get(&path).add_header("cookie", &f.owner).await.json();
        assert!(owner_view.get("details").is_none());

        let admin_view: Value = f.server.get(&path).add_header("cookie", &f.admin).await.json();
        assert_eq!(admin_view["details"]["employees"][0]["fullName"], "Ana Kovač");

        approve_fully(&f, ngo.id).await;

        let anonymous = f.server.get(&path).await;
        anonymous.assert_status_ok();
        assert!(anonymous.json::<Value>().get("details").is_none());
    }

    #[tokio::test]
    async fn test_list_scopes_by_role() {
        let f = fixture().await;
        let first = submit(&f, "Green Valley", "Sarajevo").await;
        submit(&f, "Blue River", "Mostar").await;
        set_status(&f, &f.admin, first.id, json!({"status": "admin_approved"}))
            .await
            .assert_status_ok();

        let own: PaginatedResponse<NgoResponse> = f.server.get("/api/ngos").add_header("cookie", &f.owner).await.json();
        assert_eq!(own.total_count, 2);

        let theirs: PaginatedResponse<NgoResponse> = f.server.get("/api/ngos").add_header("cookie", &f.stranger).await.json();
        assert_eq!(theirs.total_count, 0);

        let pending: PaginatedResponse<NgoResponse> = f
            .server
            .get("/api/ngos?status=pending")
            .add_header("cookie", &f.admin)
            .await
            .json();
        assert_eq!(pending.total_count, 1);
        assert_eq!(pending.data[0].profile.name, "Blue River");

        let all: PaginatedResponse<NgoResponse> = f
            .server
            .get("/api/ngos?limit=1")
            .add_header("cookie", &f.super_admin)
            .await
            .json();
        assert_eq!(all.total_count, 2);
        assert_eq!(all.data.len(), 1);

        f.server.get("/api/ngos").await.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_public_directory_lists_approved_only() {
        let f = fixture().await;
        let approved = submit(&f, "Green Valley", "Sarajevo").await;
        let other = submit(&f, "Blue River", "Mostar").await;
        submit(&f, "Still Pending", "Sarajevo").await;
        approve_fully(&f, approved.id).await;
        approve_fully(&f, other.id).await;

        let page: Value = f.server.get("/api/public/ngos").await.json();
        assert_eq!(page["totalCount"], 2);
        assert!(page["data"][0].get("details").is_none());

        let page: PaginatedResponse<NgoResponse> = f.server.get("/api/public/ngos?city=sarajevo").await.json();
        assert_eq!(page.total_count, 1);
        assert_eq!(page.data[0].id, approved.id);

        let page: PaginatedResponse<NgoResponse> = f.server.get("/api/public/ngos?search=RIVER").await.json();
        assert_eq!(page.total_count, 1);
        assert_eq!(page.data[0].id, other.id);
    }

    #[tokio::test]
    async fn test_owner_edit_rules() {
        let f = fixture().await;
        let ngo = submit(&f, "Green Valley", "Sarajevo").await;
        let path = format!("/api/ngos/{}", ngo.id);
        let mut update = sample_ngo_create("Green Valley Renamed", "Sarajevo");

        // Under review
        let response = f.server.put(&path).add_header("cookie", &f.owner).json(&update).await;
        response.assert_status(StatusCode::FORBIDDEN);

        // Not the owner
        let response = f.server.put(&path).add_header("cookie", &f.stranger).json(&update).await;
        response.assert_status(StatusCode::FORBIDDEN);
        let record = f.state.storage.get_ngo(ngo.id).await.unwrap().unwrap();
        assert_eq!(record.profile.name, "Green Valley");

        approve_fully(&f, ngo.id).await;

        let response = f.server.put(&path).add_header("cookie", &f.owner).json(&update).await;
        response.assert_status_ok();
        let body: NgoResponse = response.json();
        assert_eq!(body.profile.name, "Green Valley Renamed");
        assert_eq!(body.status, NgoStatus::Pending);
        assert!(body.approved_by_admin_id.is_none());
        assert!(body.approved_by_super_admin_at.is_none());

        // Reviewer edits leave the review alone
        update.profile.city = Some("Tuzla".to_string());
        let response = f.server.put(&path).add_header("cookie", &f.admin).json(&update).await;
        response.assert_status_ok();
        let body: NgoResponse = response.json();
        assert_eq!(body.status, NgoStatus::Pending);
        assert_eq!(body.profile.city.as_deref(), Some("Tuzla"));
    }

    #[tokio::test]
    async fn test_owner_profile_edit_keeps_hidden_details() {
        let f = fixture().await;
        let ngo = submit(&f, "Green Valley", "Sarajevo").await;
        approve_fully(&f, ngo.id).await;
        let path = format!("/api/ngos/{}", ngo.id);

        let mut owner_view: Value = f.server.get(&path).add_header("cookie", &f.owner).await.json();
        assert!(owner_view.get("details").is_none());
        owner_view["profile"]["name"] = json!("Green Valley Renamed");

        f.server
            .put(&path)
            .add_header("cookie", &f.owner)
            .json(&json!({ "profile": owner_view["profile"] }))
            .await
            .assert_status_ok();

        let record = f.state.storage.get_ngo(ngo.id).await.unwrap().unwrap();
        assert_eq!(record.profile.name, "Green Valley Renamed");
        assert_eq!(record.status, NgoStatus::Pending);
        assert_eq!(record.details, sample_ngo_create("Green Valley", "Sarajevo").details);
    }

    #[tokio::test]
    async fn test_promoted_owner_cannot_approve_own_record() {
        let f = fixture().await;
        let ngo = submit(&f, "Green Valley", "Sarajevo").await;

        let owner = f.state.storage.get_user_by_username("owner").await.unwrap().unwrap();
        f.state
            .storage
            .update_user(owner.id, &UserUpdateDBRequest::role(Role::Admin))
            .await
            .unwrap();

        let response = set_status(&f, &f.owner, ngo.id, json!({"status": "admin_approved"})).await;
        response.assert_status(StatusCode::FORBIDDEN);
        let record = f.state.storage.get_ngo(ngo.id).await.unwrap().unwrap();
        assert_eq!(record.status, NgoStatus::Pending);
        assert!(record.approved_by_admin_id.is_none());

        set_status(&f, &f.admin, ngo.id, json!({"status": "admin_approved"}))
            .await
            .assert_status_ok();
    }

    #[tokio::test]
    async fn test_rejected_record_is_locked_for_owner() {
        let f = fixture().await;
        let ngo = submit(&f, "Green Valley", "Sarajevo").await;
        set_status(&f, &f.admin, ngo.id, json!({"status": "rejected", "rejectionReason": "Duplicate"}))
            .await
            .assert_status_ok();

        let response = f
            .server
            .put(&format!("/api/ngos/{}", ngo.id))
            .add_header("cookie", &f.owner)
            .json(&sample_ngo_create("Second Try", "Sarajevo"))
            .await;
        response.assert_status(StatusCode::FORBIDDEN);

        let response = set_status(&f, &f.super_admin, ngo.id, json!({"status": "approved"})).await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_delete_is_admin_only() {
        let f = fixture().await;
        let ngo = submit(&f, "Green Valley", "Sarajevo").await;
        let path = format!("/api/ngos/{}", ngo.id);

        f.server
            .delete(&path)
            .add_header("cookie", &f.owner)
            .await
            .assert_status(StatusCode::FORBIDDEN);
        f.server.delete(&path).add_header("cookie", &f.admin).await.assert_status_ok();
        f.server
            .delete(&path)
            .add_header("cookie", &f.admin)
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}
