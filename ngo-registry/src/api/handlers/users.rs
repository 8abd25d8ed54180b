use axum::{
    Json,
    extract::{Path, Query, State},
};
use tracing::info;

use crate::{
    AppState,
    api::models::{
        pagination::PaginatedResponse,
        users::{ListUsersQuery, UserResponse, UserRoleUpdate, UserStatusUpdate},
    },
    auth::current_user::{RequiresAdmin, RequiresSuperAdmin},
    db::{
        errors::DbError,
        models::users::{UserDBResponse, UserUpdateDBRequest},
        storage::UserFilter,
    },
    errors::Error,
    types::{Operation, Role, UserId, UserStatus},
};

async fn load_user(state: &AppState, id: UserId) -> Result<UserDBResponse, Error> {
    state.storage.get_user(id).await?.ok_or_else(|| Error::NotFound {
        resource: "User".to_string(),
        id: id.to_string(),
    })
}

fn refuse_self(caller: UserId, target: UserId, what: &str) -> Result<(), Error> {
    if caller == target {
        return Err(Error::BadRequest {
            message: format!("You cannot {what} your own account"),
        });
    }
    Ok(())
}

/// List accounts (admin only)
#[utoipa::path(
    get,
    path = "/api/admin/users",
    tag = "users",
    params(ListUsersQuery),
    responses(
        (status = 200, description = "Page of accounts", body = PaginatedResponse<UserResponse>),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Admin access required"),
    ),
    security(("session_cookie" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_users(
    State(state): State<AppState>,
    RequiresAdmin(_admin): RequiresAdmin,
    Query(query): Query<ListUsersQuery>,
) -> Result<Json<PaginatedResponse<UserResponse>>, Error> {
    let (skip, limit) = query.pagination.params();
    let filter = UserFilter::new(skip, limit).with_role(query.role);

    let users = state.storage.list_users(&filter).await?;
    let total_count = state.storage.count_users(&filter).await?;

    let data = users.into_iter().map(UserResponse::from).collect();
    Ok(Json(PaginatedResponse::new(data, total_count, skip, limit)))
}

/// Suspend or reactivate an account.
///
/// Admins manage user accounts; only a super admin may change another admin. Super admin
/// accounts cannot be suspended. Suspension signs the account out everywhere.
#[utoipa::path(
    patch,
    path = "/api/admin/users/{id}/status",
    tag = "users",
    request_body = UserStatusUpdate,
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 200, description = "Status updated", body = UserResponse),
        (status = 400, description = "Cannot change own status"),
        (status = 403, description = "Target account is protected"),
        (status = 404, description = "User not found"),
    ),
    security(("session_cookie" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_user_status(
    State(state): State<AppState>,
    RequiresAdmin(caller): RequiresAdmin,
    Path(id): Path<UserId>,
    Json(request): Json<UserStatusUpdate>,
) -> Result<Json<UserResponse>, Error> {
    refuse_self(caller.id, id, "change the status of")?;
    let target = load_user(&state, id).await?;

    match target.role {
        Role::SuperAdmin => {
            return Err(Error::Forbidden {
                message: "Super admin accounts cannot be suspended".to_string(),
            });
        }
        Role::Admin if caller.role != Role::SuperAdmin => {
            return Err(Error::Forbidden {
                message: "Only a super admin can change the status of an admin".to_string(),
            });
        }
        _ => {}
    }

    let updated = state
        .storage
        .update_user(id, &UserUpdateDBRequest::status(request.status))
        .await?;
    if request.status == UserStatus::Suspended {
        let revoked = state.sessions.revoke_user(id);
        info!(user_id = id, revoked, suspended_by = caller.id, "Account suspended");
    }

    Ok(Json(UserResponse::from(updated)))
}

/// Change an account's role (super admin only).
///
/// Accounts can be moved between `user` and `admin`. Nobody is promoted to super admin
/// through the API and existing super admins cannot be changed.
#[utoipa::path(
    patch,
    path = "/api/super-admin/users/{id}/role",
    tag = "users",
    request_body = UserRoleUpdate,
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 200, description = "Role updated", body = UserResponse),
        (status = 400, description = "Own account, or promotion to super admin"),
        (status = 403, description = "Target is a super admin"),
        (status = 404, description = "User not found"),
    ),
    security(("session_cookie" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_user_role(
    State(state): State<AppState>,
    RequiresSuperAdmin(caller): RequiresSuperAdmin,
    Path(id): Path<UserId>,
    Json(request): Json<UserRoleUpdate>,
) -> Result<Json<UserResponse>, Error> {
    refuse_self(caller.id, id, "change the role of")?;
    if request.role == Role::SuperAdmin {
        return Err(Error::BadRequest {
            message: "Accounts cannot be promoted to super admin".to_string(),
        });
    }

    let target = load_user(&state, id).await?;
    if target.role == Role::SuperAdmin {
        return Err(Error::Forbidden {
            message: "The role of a super admin cannot be changed".to_string(),
        });
    }

    let updated = state.storage.update_user(id, &UserUpdateDBRequest::role(request.role)).await?;
    info!(user_id = id, from = %target.role, to = %updated.role, "Role changed");

    Ok(Json(UserResponse::from(updated)))
}

/// Delete an account (super admin only).
///
/// Accounts that still own NGO records cannot be deleted.
#[utoipa::path(
    delete,
    path = "/api/super-admin/users/{id}",
    tag = "users",
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 200, description = "Deleted account", body = UserResponse),
        (status = 400, description = "Cannot delete own account"),
        (status = 403, description = "Target is a super admin or still owns records"),
        (status = 404, description = "User not found"),
    ),
    security(("session_cookie" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_user(
    State(state): State<AppState>,
    RequiresSuperAdmin(caller): RequiresSuperAdmin,
    Path(id): Path<UserId>,
) -> Result<Json<UserResponse>, Error> {
    refuse_self(caller.id, id, "delete")?;
    let target = load_user(&state, id).await?;
    if target.role == Role::SuperAdmin {
        return Err(Error::Forbidden {
            message: "Super admin accounts cannot be deleted".to_string(),
        });
    }

    let owned = state.storage.get_ngos_by_user_id(id).await?;
    if !owned.is_empty() {
        return Err(DbError::ProtectedEntity {
            operation: Operation::Delete,
            reason: format!("the account still owns {} NGO record(s)", owned.len()),
            entity_type: "user".to_string(),
            entity_id: Some(id.to_string()),
        }
        .into());
    }

    if !state.storage.delete_user(id).await? {
        return Err(Error::NotFound {
            resource: "User".to_string(),
            id: id.to_string(),
        });
    }
    let revoked = state.sessions.revoke_user(id);
    info!(user_id = id, revoked, deleted_by = caller.id, "Account deleted");

    Ok(Json(UserResponse::from(target)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::ngos::NgoCreateDBRequest;
    use crate::test_utils::{create_test_server, create_test_state, create_test_user, sample_ngo_create, session_cookie};
    use axum::http::StatusCode;
    use serde_json::{Value, json};

    #[tokio::test]
    async fn test_list_users_requires_admin() {
        let state = create_test_state();
        let server = create_test_server(&state);
        let user = create_test_user(&state, "amra", Role::User).await;
        let admin = create_test_user(&state, "admin", Role::Admin).await;
        create_test_user(&state, "second", Role::User).await;

        server
            .get("/api/admin/users")
            .add_header("cookie", session_cookie(&state, user.id))
            .await
            .assert_status(StatusCode::FORBIDDEN);

        let page: PaginatedResponse<UserResponse> = server
            .get("/api/admin/users?role=user&limit=1")
            .add_header("cookie", session_cookie(&state, admin.id))
            .await
            .json();
        assert_eq!(page.total_count, 2);
        assert_eq!(page.data.len(), 1);
        assert_eq!(page.limit, 1);

        // Password hashes never appear on the wire
        let raw: Value = server
            .get("/api/admin/users")
            .add_header("cookie", session_cookie(&state, admin.id))
            .await
            .json();
        assert!(raw["data"][0].get("passwordHash").is_none());
    }

    #[tokio::test]
    async fn test_suspension_rules() {
        let state = create_test_state();
        let server = create_test_server(&state);
        let user = create_test_user(&state, "amra", Role::User).await;
        let admin = create_test_user(&state, "admin", Role::Admin).await;
        let other_admin = create_test_user(&state, "admin2", Role::Admin).await;
        let root = create_test_user(&state, "root", Role::SuperAdmin).await;
        let admin_cookie = session_cookie(&state, admin.id);
        let user_cookie = session_cookie(&state, user.id);

        let suspend = json!({"status": "suspended"});

        server
            .patch(&format!("/api/admin/users/{}/status", admin.id))
            .add_header("cookie", &admin_cookie)
            .json(&suspend)
            .await
            .assert_status(StatusCode::BAD_REQUEST);
        server
            .patch(&format!("/api/admin/users/{}/status", other_admin.id))
            .add_header("cookie", &admin_cookie)
            .json(&suspend)
            .await
            .assert_status(StatusCode::FORBIDDEN);
        server
            .patch(&format!("/api/admin/users/{}/status", root.id))
            .add_header("cookie", &admin_cookie)
            .json(&suspend)
            .await
            .assert_status(StatusCode::FORBIDDEN);
        server
            .patch("/api/admin/users/9999/status")
            .add_header("cookie", &admin_cookie)
            .json(&suspend)
            .await
            .assert_status(StatusCode::NOT_FOUND);

        let response = server
            .patch(&format!("/api/admin/users/{}/status", user.id))
            .add_header("cookie", &admin_cookie)
            .json(&suspend)
            .await;
        response.assert_status_ok();
        assert_eq!(response.json::<UserResponse>().status, UserStatus::Suspended);
        server
            .get("/api/auth/me")
            .add_header("cookie", &user_cookie)
            .await
            .assert_status(StatusCode::UNAUTHORIZED);

        // A super admin may manage admins
        server
            .patch(&format!("/api/admin/users/{}/status", other_admin.id))
            .add_header("cookie", session_cookie(&state, root.id))
            .json(&suspend)
            .await
            .assert_status_ok();
    }

    #[tokio::test]
    async fn test_role_change_rules() {
        let state = create_test_state();
        let server = create_test_server(&state);
        let user = create_test_user(&state, "amra", Role::User).await;
        let admin = create_test_user(&state, "admin", Role::Admin).await;
        let root = create_test_user(&state, "root", Role::SuperAdmin).await;
        let other_root = create_test_user(&state, "root2", Role::SuperAdmin).await;
        let root_cookie = session_cookie(&state, root.id);

        server
            .patch(&format!("/api/super-admin/users/{}/role", user.id))
            .add_header("cookie", session_cookie(&state, admin.id))
            .json(&json!({"role": "admin"}))
            .await
            .assert_status(StatusCode::FORBIDDEN);
        server
            .patch(&format!("/api/super-admin/users/{}/role", root.id))
            .add_header("cookie", &root_cookie)
            .json(&json!({"role": "admin"}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
        server
            .patch(&format!("/api/super-admin/users/{}/role", user.id))
            .add_header("cookie", &root_cookie)
            .json(&json!({"role": "super_admin"}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
        server
            .patch(&format!("/api/super-admin/users/{}/role", other_root.id))
            .add_header("cookie", &root_cookie)
            .json(&json!({"role": "user"}))
            .await
            .assert_status(StatusCode::FORBIDDEN);

        let response = server
            .patch(&format!("/api/super-admin/users/{}/role", user.id))
            .add_header("cookie", &root_cookie)
            .json(&json!({"role": "admin"}))
            .await;
        response.assert_status_ok();
        assert_eq!(response.json::<UserResponse>().role, Role::Admin);

        // The promotion is effective on the next request of an existing session
        server
            .get("/api/admin/users")
            .add_header("cookie", session_cookie(&state, user.id))
            .await
            .assert_status_ok();
    }

    #[tokio::test]
    async fn test_delete_user_rules() {
        let state = create_test_state();
        let server = create_test_server(&state);
        let owner = create_test_user(&state, "owner", Role::User).await;
        let idle = create_test_user(&state, "idle", Role::User).await;
        let root = create_test_user(&state, "root", Role::SuperAdmin).await;
        let root_cookie = session_cookie(&state, root.id);
        state
            .storage
            .create_ngo(&NgoCreateDBRequest::new(owner.id, sample_ngo_create("Green Valley", "Sarajevo")))
            .await
            .unwrap();

        server
            .delete(&format!("/api/super-admin/users/{}", root.id))
            .add_header("cookie", &root_cookie)
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        let response = server
            .delete(&format!("/api/super-admin/users/{}", owner.id))
            .add_header("cookie", &root_cookie)
            .await;
        response.assert_status(StatusCode::FORBIDDEN);
        assert!(state.storage.get_user(owner.id).await.unwrap().is_some());

        let idle_cookie = session_cookie(&state, idle.id);
        server
            .delete(&format!("/api/super-admin/users/{}", idle.id))
            .add_header("cookie", &root_cookie)
            .await
            .assert_status_ok();
        assert!(state.storage.get_user(idle.id).await.unwrap().is_none());
        server
            .get("/api/auth/me")
            .add_header("cookie", &idle_cookie)
            .await
            .assert_status(StatusCode::UNAUTHORIZED);

        server
            .delete(&format!("/api/super-admin/users/{}", idle.id))
            .add_header("cookie", &root_cookie)
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}
