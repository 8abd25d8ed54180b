//! Storage collaborator injected into the application state.
//!
//! Handlers only ever see `Arc<dyn Storage>`; the backend is picked from configuration at
//! startup ([`MemoryStorage`](super::memory::MemoryStorage) or
//! [`PgStorage`](super::postgres::PgStorage)). Both report failures through the same
//! [`DbError`](super::errors::DbError) variants.

use crate::db::errors::Result;
use crate::db::models::{
    announcements::{AnnouncementCreateDBRequest, AnnouncementDBResponse, AnnouncementUpdateDBRequest},
    ngos::{ApprovalDBUpdate, NgoCreateDBRequest, NgoDBResponse, NgoFilter, NgoUpdateDBRequest},
    users::{UserCreateDBRequest, UserDBResponse, UserUpdateDBRequest},
};
use crate::types::{AnnouncementId, NgoId, NgoStatus, Role, UserId};

/// Filter for listing users
#[derive(Debug, Clone)]
pub struct UserFilter {
    pub role: Option<Role>,
    pub skip: i64,
    pub limit: i64,
}

impl UserFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self { role: None, skip, limit }
    }

    pub fn with_role(mut self, role: Option<Role>) -> Self {
        self.role = role;
        self
    }
}

#[async_trait::async_trait]
pub trait Storage: Send + Sync {
    async fn get_user(&self, id: UserId) -> Result<Option<UserDBResponse>>;

    /// Case-insensitive lookup.
    async fn get_user_by_username(&self, username: &str) -> Result<Option<UserDBResponse>>;

    /// Fails with `UniqueViolation` when the username is taken (ignoring case).
    async fn create_user(&self, request: &UserCreateDBRequest) -> Result<UserDBResponse>;

    /// Fails with `NotFound` when the user does not exist.
    async fn update_user(&self, id: UserId, request: &UserUpdateDBRequest) -> Result<UserDBResponse>;

    /// Ordered by id. `skip`/`limit` apply after the role filter.
    async fn list_users(&self, filter: &UserFilter) -> Result<Vec<UserDBResponse>>;

    async fn count_users(&self, filter: &UserFilter) -> Result<i64>;

    /// Returns `false` when there was nothing to delete. Fails with `ProtectedEntity` while
    /// the user still owns NGO records or announcements.
    async fn delete_user(&self, id: UserId) -> Result<bool>;

    async fn get_ngo(&self, id: NgoId) -> Result<Option<NgoDBResponse>>;

    /// Newest first.
    async fn get_ngos(&self, filter: &NgoFilter, skip: i64, limit: i64) -> Result<Vec<NgoDBResponse>>;

    async fn count_ngos(&self, filter: &NgoFilter) -> Result<i64>;

    async fn get_ngos_by_user_id(&self, user_id: UserId) -> Result<Vec<NgoDBResponse>> {
        self.get_ngos(&NgoFilter::created_by(user_id), 0, i64::MAX).await
    }

    /// New records always start out `Pending` with empty audit fields.
    async fn create_ngo(&self, request: &NgoCreateDBRequest) -> Result<NgoDBResponse>;

    /// Replace a record's content, provided it is still in `expected` status.
    ///
    /// Fails with `StaleWrite` when another request changed the status in between.
    async fn update_ngo(&self, id: NgoId, expected: NgoStatus, request: &NgoUpdateDBRequest) -> Result<NgoDBResponse>;

    /// Apply a review decision, provided the record is still in `expected` status.
    async fn update_ngo_approval(&self, id: NgoId, expected: NgoStatus, update: &ApprovalDBUpdate) -> Result<NgoDBResponse>;

    async fn delete_ngo(&self, id: NgoId) -> Result<bool>;

    /// Newest first; drafts only when `include_drafts` is set.
    async fn list_announcements(&self, include_drafts: bool) -> Result<Vec<AnnouncementDBResponse>>;

    async fn get_announcement(&self, id: AnnouncementId) -> Result<Option<AnnouncementDBResponse>>;

    async fn create_announcement(&self, request: &AnnouncementCreateDBRequest) -> Result<AnnouncementDBResponse>;

    async fn update_announcement(
        &self,
        id: AnnouncementId,
        request: &AnnouncementUpdateDBRequest,
    ) -> Result<AnnouncementDBResponse>;

    async fn delete_announcement(&self, id: AnnouncementId) -> Result<bool>;
}
