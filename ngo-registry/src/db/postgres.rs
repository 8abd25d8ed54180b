//! PostgreSQL storage backend.
//!
//! Queries are built at runtime with `sqlx::query_as` so the crate compiles without a
//! live database. Every single-record mutation is one `UPDATE ... RETURNING` statement;
//! review decisions and content edits additionally match on the status the caller read,
//! so a concurrent decision surfaces as [`DbError::StaleWrite`] instead of being lost.

use crate::api::models::ngos::{NgoDetails, NgoProfile};
use crate::db::errors::{DbError, Result};
use crate::db::models::{
    announcements::{AnnouncementCreateDBRequest, AnnouncementDBResponse, AnnouncementUpdateDBRequest},
    ngos::{ApprovalDBUpdate, NgoCreateDBRequest, NgoDBResponse, NgoFilter, NgoUpdateDBRequest, ReviewStamp},
    users::{UserCreateDBRequest, UserDBResponse, UserUpdateDBRequest},
};
use crate::db::storage::{Storage, UserFilter};
use crate::types::{AnnouncementId, NgoId, NgoStatus, Operation, UserId};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, types::Json};
use tracing::instrument;

const USER_COLUMNS: &str = "id, username, email, display_name, password_hash, role, status, created_at, updated_at";

const NGO_COLUMNS: &str = "id, created_by, name, registration_number, legal_form, description, address, city, phone, \
     email, website, founded_year, areas_of_activity, details, status, approved_by_admin_id, approved_by_admin_at, \
     approved_by_super_admin_id, approved_by_super_admin_at, rejected_by_id, rejected_at, rejection_reason, \
     created_at, updated_at";

const ANNOUNCEMENT_COLUMNS: &str = "id, title, body, published, created_by, created_at, updated_at";

const NGO_FILTER: &str = "($1::ngo_status IS NULL OR status = $1) \
     AND ($2::bigint IS NULL OR created_by = $2) \
     AND ($3::text IS NULL OR name ILIKE $3 OR description ILIKE $3 \
          OR EXISTS (SELECT 1 FROM unnest(areas_of_activity) AS area WHERE area ILIKE $3)) \
     AND ($4::text IS NULL OR LOWER(city) = LOWER($4))";

// Flat row shape of the `ngos` table
#[derive(Debug, FromRow)]
struct NgoRow {
    id: NgoId,
    created_by: UserId,
    name: String,
    registration_number: String,
    legal_form: Option<String>,
    description: Option<String>,
    address: Option<String>,
    city: Option<String>,
    phone: Option<String>,
    email: Option<String>,
    website: Option<String>,
    founded_year: Option<i32>,
    areas_of_activity: Vec<String>,
    details: Json<NgoDetails>,
    status: NgoStatus,
    approved_by_admin_id: Option<UserId>,
    approved_by_admin_at: Option<DateTime<Utc>>,
    approved_by_super_admin_id: Option<UserId>,
    approved_by_super_admin_at: Option<DateTime<Utc>>,
    rejected_by_id: Option<UserId>,
    rejected_at: Option<DateTime<Utc>>,
    rejection_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<NgoRow> for NgoDBResponse {
    fn from(row: NgoRow) -> Self {
        Self {
            id: row.id,
            created_by: row.created_by,
            profile: NgoProfile {
                name: row.name,
                registration_number: row.registration_number,
                legal_form: row.legal_form,
                description: row.description,
                address: row.address,
                city: row.city,
                phone: row.phone,
                email: row.email,
                website: row.website,
                founded_year: row.founded_year,
                areas_of_activity: row.areas_of_activity,
            },
            details: row.details.0,
            status: row.status,
            approved_by_admin_id: row.approved_by_admin_id,
            approved_by_admin_at: row.approved_by_admin_at,
            approved_by_super_admin_id: row.approved_by_super_admin_id,
            approved_by_super_admin_at: row.approved_by_super_admin_at,
            rejected_by_id: row.rejected_by_id,
            rejected_at: row.rejected_at,
            rejection_reason: row.rejection_reason,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Audit columns written by a review decision. `None` keeps the stored value.
#[derive(Default)]
struct StampColumns {
    admin_id: Option<UserId>,
    admin_at: Option<DateTime<Utc>>,
    super_admin_id: Option<UserId>,
    super_admin_at: Option<DateTime<Utc>>,
    rejected_by_id: Option<UserId>,
    rejected_at: Option<DateTime<Utc>>,
    rejection_reason: Option<String>,
    at: Option<DateTime<Utc>>,
}

impl From<&ReviewStamp> for StampColumns {
    fn from(stamp: &ReviewStamp) -> Self {
        match stamp {
            ReviewStamp::AdminApproval { by, at } => Self {
                admin_id: Some(*by),
                admin_at: Some(*at),
                at: Some(*at),
                ..Default::default()
            },
            ReviewStamp::SuperAdminApproval { by, at } => Self {
                super_admin_id: Some(*by),
                super_admin_at: Some(*at),
                at: Some(*at),
                ..Default::default()
            },
            ReviewStamp::Rejection { by, at, reason } => Self {
                rejected_by_id: Some(*by),
                rejected_at: Some(*at),
                rejection_reason: Some(reason.clone()),
                at: Some(*at),
                ..Default::default()
            },
        }
    }
}

/// `%needle%` for ILIKE, with the pattern metacharacters escaped.
fn like_pattern(needle: &str) -> String {
    let escaped = needle
        .trim()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

#[derive(Clone)]
pub struct PgStorage {
    pool: PgPool,
}

impl PgStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Tell a missing record apart from one whose status moved under us.
    async fn missing_or_stale(&self, id: NgoId) -> DbError {
        match sqlx::query_scalar::<_, i64>("SELECT id FROM ngos WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
        {
            Ok(Some(_)) => DbError::StaleWrite {
                entity_type: "NGO record".to_string(),
                entity_id: id.to_string(),
            },
            Ok(None) => DbError::NotFound,
            Err(e) => e.into(),
        }
    }
}

#[async_trait::async_trait]
impl Storage for PgStorage {
    #[instrument(skip(self), err)]
    async fn get_user(&self, id: UserId) -> Result<Option<UserDBResponse>> {
        let user = sqlx::query_as::<_, UserDBResponse>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    #[instrument(skip(self), err)]
    async fn get_user_by_username(&self, username: &str) -> Result<Option<UserDBResponse>> {
        let user = sqlx::query_as::<_, UserDBResponse>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE LOWER(username) = LOWER($1)"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    #[instrument(skip(self, request), fields(username = %request.username), err)]
    async fn create_user(&self, request: &UserCreateDBRequest) -> Result<UserDBResponse> {
        let user = sqlx::query_as::<_, UserDBResponse>(&format!(
            "INSERT INTO users (username, email, display_name, password_hash, role)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {USER_COLUMNS}"
        ))
        .bind(&request.username)
        .bind(&request.email)
        .bind(&request.display_name)
        .bind(&request.password_hash)
        .bind(request.role)
        .fetch_one(&self.pool)
        .await?;
        Ok(user)
    }

    #[instrument(skip(self, request), err)]
    async fn update_user(&self, id: UserId, request: &UserUpdateDBRequest) -> Result<UserDBResponse> {
        let user = sqlx::query_as::<_, UserDBResponse>(&format!(
            "UPDATE users SET
                email = COALESCE($2, email),
                display_name = COALESCE($3, display_name),
                password_hash = COALESCE($4, password_hash),
                role = COALESCE($5, role),
                status = COALESCE($6, status),
                updated_at = NOW()
             WHERE id = $1
             RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(&request.email)
        .bind(&request.display_name)
        .bind(&request.password_hash)
        .bind(request.role)
        .bind(request.status)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(DbError::NotFound)?;
        Ok(user)
    }

    #[instrument(skip(self), err)]
    async fn list_users(&self, filter: &UserFilter) -> Result<Vec<UserDBResponse>> {
        let users = sqlx::query_as::<_, UserDBResponse>(&format!(
            "SELECT {USER_COLUMNS} FROM users
             WHERE ($1::user_role IS NULL OR role = $1)
             ORDER BY id
             OFFSET $2 LIMIT $3"
        ))
        .bind(filter.role)
        .bind(filter.skip)
        .bind(filter.limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    #[instrument(skip(self), err)]
    async fn count_users(&self, filter: &UserFilter) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE ($1::user_role IS NULL OR role = $1)")
            .bind(filter.role)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    #[instrument(skip(self), err)]
    async fn delete_user(&self, id: UserId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| match DbError::from(e) {
                // ngos.created_by and announcements.created_by are ON DELETE RESTRICT
                DbError::ForeignKeyViolation { .. } => DbError::ProtectedEntity {
                    operation: Operation::Delete,
                    reason: "the account still owns NGO records or announcements".to_string(),
                    entity_type: "user".to_string(),
                    entity_id: Some(id.to_string()),
                },
                other => other,
            })?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), err)]
    async fn get_ngo(&self, id: NgoId) -> Result<Option<NgoDBResponse>> {
        let row = sqlx::query_as::<_, NgoRow>(&format!("SELECT {NGO_COLUMNS} FROM ngos WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(NgoDBResponse::from))
    }

    #[instrument(skip(self), err)]
    async fn get_ngos(&self, filter: &NgoFilter, skip: i64, limit: i64) -> Result<Vec<NgoDBResponse>> {
        let rows = sqlx::query_as::<_, NgoRow>(&format!(
            "SELECT {NGO_COLUMNS} FROM ngos WHERE {NGO_FILTER} ORDER BY id DESC OFFSET $5 LIMIT $6"
        ))
        .bind(filter.status)
        .bind(filter.created_by)
        .bind(filter.search.as_deref().map(like_pattern))
        .bind(filter.city.as_deref().map(str::trim))
        .bind(skip)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(NgoDBResponse::from).collect())
    }

    #[instrument(skip(self), err)]
    async fn count_ngos(&self, filter: &NgoFilter) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM ngos WHERE {NGO_FILTER}"))
            .bind(filter.status)
            .bind(filter.created_by)
            .bind(filter.search.as_deref().map(like_pattern))
            .bind(filter.city.as_deref().map(str::trim))
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    #[instrument(skip(self, request), fields(created_by = request.created_by), err)]
    async fn create_ngo(&self, request: &NgoCreateDBRequest) -> Result<NgoDBResponse> {
        let profile = &request.profile;
        let row = sqlx::query_as::<_, NgoRow>(&format!(
            "INSERT INTO ngos (created_by, name, registration_number, legal_form, description, address, city,
                               phone, email, website, founded_year, areas_of_activity, details)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
             RETURNING {NGO_COLUMNS}"
        ))
        .bind(request.created_by)
        .bind(&profile.name)
        .bind(&profile.registration_number)
        .bind(&profile.legal_form)
        .bind(&profile.description)
        .bind(&profile.address)
        .bind(&profile.city)
        .bind(&profile.phone)
        .bind(&profile.email)
        .bind(&profile.website)
        .bind(profile.founded_year)
        .bind(&profile.areas_of_activity)
        .bind(Json(&request.details))
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    #[instrument(skip(self, request), err)]
    async fn update_ngo(&self, id: NgoId, expected: NgoStatus, request: &NgoUpdateDBRequest) -> Result<NgoDBResponse> {
        let profile = &request.profile;
        let row = sqlx::query_as::<_, NgoRow>(&format!(
            "UPDATE ngos SET
                name = $3, registration_number = $4, legal_form = $5, description = $6, address = $7,
                city = $8, phone = $9, email = $10, website = $11, founded_year = $12,
                areas_of_activity = $13, details = COALESCE($14, details),
                status = CASE WHEN $15 THEN 'pending'::ngo_status ELSE status END,
                approved_by_admin_id = CASE WHEN $15 THEN NULL ELSE approved_by_admin_id END,
                approved_by_admin_at = CASE WHEN $15 THEN NULL ELSE approved_by_admin_at END,
                approved_by_super_admin_id = CASE WHEN $15 THEN NULL ELSE approved_by_super_admin_id END,
                approved_by_super_admin_at = CASE WHEN $15 THEN NULL ELSE approved_by_super_admin_at END,
                rejected_by_id = CASE WHEN $15 THEN NULL ELSE rejected_by_id END,
                rejected_at = CASE WHEN $15 THEN NULL ELSE rejected_at END,
                rejection_reason = CASE WHEN $15 THEN NULL ELSE rejection_reason END,
                updated_at = NOW()
             WHERE id = $1 AND status = $2
             RETURNING {NGO_COLUMNS}"
        ))
        .bind(id)
        .bind(expected)
        .bind(&profile.name)
        .bind(&profile.registration_number)
        .bind(&profile.legal_form)
        .bind(&profile.description)
        .bind(&profile.address)
        .bind(&profile.city)
        .bind(&profile.phone)
        .bind(&profile.email)
        .bind(&profile.website)
        .bind(profile.founded_year)
        .bind(&profile.areas_of_activity)
        .bind(request.details.as_ref().map(Json))
        .bind(request.reset_review)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(row.into()),
            None => Err(self.missing_or_stale(id).await),
        }
    }

    #[instrument(skip(self, update), fields(status = %update.status), err)]
    async fn update_ngo_approval(&self, id: NgoId, expected: NgoStatus, update: &ApprovalDBUpdate) -> Result<NgoDBResponse> {
        let stamp = StampColumns::from(&update.stamp);
        let row = sqlx::query_as::<_, NgoRow>(&format!(
            "UPDATE ngos SET
                status = $3,
                approved_by_admin_id = COALESCE($4, approved_by_admin_id),
                approved_by_admin_at = COALESCE($5, approved_by_admin_at),
                approved_by_super_admin_id = COALESCE($6, approved_by_super_admin_id),
                approved_by_super_admin_at = COALESCE($7, approved_by_super_admin_at),
                rejected_by_id = COALESCE($8, rejected_by_id),
                rejected_at = COALESCE($9, rejected_at),
                rejection_reason = COALESCE($10, rejection_reason),
                updated_at = COALESCE($11, NOW())
             WHERE id = $1 AND status = $2
             RETURNING {NGO_COLUMNS}"
        ))
        .bind(id)
        .bind(expected)
        .bind(update.status)
        .bind(stamp.admin_id)
        .bind(stamp.admin_at)
        .bind(stamp.super_admin_id)
        .bind(stamp.super_admin_at)
        .bind(stamp.rejected_by_id)
        .bind(stamp.rejected_at)
        .bind(stamp.rejection_reason)
        .bind(stamp.at)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(row.into()),
            None => Err(self.missing_or_stale(id).await),
        }
    }

    #[instrument(skip(self), err)]
    async fn delete_ngo(&self, id: NgoId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM ngos WHERE id = $1").bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), err)]
    async fn list_announcements(&self, include_drafts: bool) -> Result<Vec<AnnouncementDBResponse>> {
        let announcements = sqlx::query_as::<_, AnnouncementDBResponse>(&format!(
            "SELECT {ANNOUNCEMENT_COLUMNS} FROM announcements WHERE $1 OR published ORDER BY id DESC"
        ))
        .bind(include_drafts)
        .fetch_all(&self.pool)
        .await?;
        Ok(announcements)
    }

    #[instrument(skip(self), err)]
    async fn get_announcement(&self, id: AnnouncementId) -> Result<Option<AnnouncementDBResponse>> {
        let announcement =
            sqlx::query_as::<_, AnnouncementDBResponse>(&format!("SELECT {ANNOUNCEMENT_COLUMNS} FROM announcements WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(announcement)
    }

    #[instrument(skip(self, request), err)]
    async fn create_announcement(&self, request: &AnnouncementCreateDBRequest) -> Result<AnnouncementDBResponse> {
        let announcement = sqlx::query_as::<_, AnnouncementDBResponse>(&format!(
            "INSERT INTO announcements (title, body, published, created_by)
             VALUES ($1, $2, $3, $4)
             RETURNING {ANNOUNCEMENT_COLUMNS}"
        ))
        .bind(&request.title)
        .bind(&request.body)
        .bind(request.published)
        .bind(request.created_by)
        .fetch_one(&self.pool)
        .await?;
        Ok(announcement)
    }

    #[instrument(skip(self, request), err)]
    async fn update_announcement(
        &self,
        id: AnnouncementId,
        request: &AnnouncementUpdateDBRequest,
    ) -> Result<AnnouncementDBResponse> {
        let announcement = sqlx::query_as::<_, AnnouncementDBResponse>(&format!(
            "UPDATE announcements SET
                title = COALESCE($2, title),
                body = COALESCE($3, body),
                published = COALESCE($4, published),
                updated_at = NOW()
             WHERE id = $1
             RETURNING {ANNOUNCEMENT_COLUMNS}"
        ))
        .bind(id)
        .bind(&request.title)
        .bind(&request.body)
        .bind(request.published)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(DbError::NotFound)?;
        Ok(announcement)
    }

    #[instrument(skip(self), err)]
    async fn delete_announcement(&self, id: AnnouncementId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM announcements WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
