//! In-process storage backend.
//!
//! Used by the test suite and by `database.type: memory` deployments. Every mutation of a
//! single record happens under that record's map entry lock, which gives the same
//! per-record atomicity as a single `UPDATE ... RETURNING` statement.

use crate::db::errors::{DbError, Result};
use crate::db::models::{
    announcements::{AnnouncementCreateDBRequest, AnnouncementDBResponse, AnnouncementUpdateDBRequest},
    ngos::{ApprovalDBUpdate, NgoCreateDBRequest, NgoDBResponse, NgoFilter, NgoUpdateDBRequest},
    users::{UserCreateDBRequest, UserDBResponse, UserUpdateDBRequest},
};
use crate::db::storage::{Storage, UserFilter};
use crate::types::{AnnouncementId, NgoId, NgoStatus, Operation, UserId, UserStatus};
use chrono::Utc;
use dashmap::{DashMap, mapref::entry::Entry};
use std::sync::atomic::{AtomicI64, Ordering};
use tracing::instrument;

pub struct MemoryStorage {
    users: DashMap<UserId, UserDBResponse>,
    /// lowercase username -> id
    usernames: DashMap<String, UserId>,
    ngos: DashMap<NgoId, NgoDBResponse>,
    announcements: DashMap<AnnouncementId, AnnouncementDBResponse>,
    next_user_id: AtomicI64,
    next_ngo_id: AtomicI64,
    next_announcement_id: AtomicI64,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            users: DashMap::new(),
            usernames: DashMap::new(),
            ngos: DashMap::new(),
            announcements: DashMap::new(),
            next_user_id: AtomicI64::new(1),
            next_ngo_id: AtomicI64::new(1),
            next_announcement_id: AtomicI64::new(1),
        }
    }
}

fn page<T>(items: Vec<T>, skip: i64, limit: i64) -> Vec<T> {
    let skip = usize::try_from(skip).unwrap_or(0);
    let limit = usize::try_from(limit).unwrap_or(0);
    items.into_iter().skip(skip).take(limit).collect()
}

fn stale(entity_type: &str, id: i64) -> DbError {
    DbError::StaleWrite {
        entity_type: entity_type.to_string(),
        entity_id: id.to_string(),
    }
}

impl MemoryStorage {
    fn filtered_users(&self, filter: &UserFilter) -> Vec<UserDBResponse> {
        let mut users: Vec<_> = self
            .users
            .iter()
            .filter(|u| filter.role.is_none_or(|role| u.role == role))
            .map(|u| u.value().clone())
            .collect();
        users.sort_by_key(|u| u.id);
        users
    }

    fn filtered_ngos(&self, filter: &NgoFilter) -> Vec<NgoDBResponse> {
        let mut ngos: Vec<_> = self
            .ngos
            .iter()
            .filter(|n| filter.matches(n.value()))
            .map(|n| n.value().clone())
            .collect();
        ngos.sort_by(|a, b| b.id.cmp(&a.id));
        ngos
    }
}

#[async_trait::async_trait]
impl Storage for MemoryStorage {
    #[instrument(skip(self), err)]
    async fn get_user(&self, id: UserId) -> Result<Option<UserDBResponse>> {
        Ok(self.users.get(&id).map(|u| u.value().clone()))
    }

    #[instrument(skip(self), err)]
    async fn get_user_by_username(&self, username: &str) -> Result<Option<UserDBResponse>> {
        let Some(id) = self.usernames.get(&username.to_lowercase()).map(|id| *id) else {
            return Ok(None);
        };
        self.get_user(id).await
    }

    #[instrument(skip(self, request), fields(username = %request.username), err)]
    async fn create_user(&self, request: &UserCreateDBRequest) -> Result<UserDBResponse> {
        match self.usernames.entry(request.username.to_lowercase()) {
            Entry::Occupied(_) => Err(DbError::duplicate_username(&request.username)),
            Entry::Vacant(slot) => {
                let id = self.next_user_id.fetch_add(1, Ordering::SeqCst);
                let now = Utc::now();
                let user = UserDBResponse {
                    id,
                    username: request.username.clone(),
                    email: request.email.clone(),
                    display_name: request.display_name.clone(),
                    password_hash: request.password_hash.clone(),
                    role: request.role,
                    status: UserStatus::Active,
                    created_at: now,
                    updated_at: now,
                };
                self.users.insert(id, user.clone());
                slot.insert(id);
                Ok(user)
            }
        }
    }

    #[instrument(skip(self, request), err)]
    async fn update_user(&self, id: UserId, request: &UserUpdateDBRequest) -> Result<UserDBResponse> {
        let mut user = self.users.get_mut(&id).ok_or(DbError::NotFound)?;
        if let Some(email) = &request.email {
            user.email = Some(email.clone());
        }
        if let Some(display_name) = &request.display_name {
            user.display_name = Some(display_name.clone());
        }
        if let Some(password_hash) = &request.password_hash {
            user.password_hash = password_hash.clone();
        }
        if let Some(role) = request.role {
            user.role = role;
        }
        if let Some(status) = request.status {
            user.status = status;
        }
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    #[instrument(skip(self), err)]
    async fn list_users(&self, filter: &UserFilter) -> Result<Vec<UserDBResponse>> {
        Ok(page(self.filtered_users(filter), filter.skip, filter.limit))
    }

    #[instrument(skip(self), err)]
    async fn count_users(&self, filter: &UserFilter) -> Result<i64> {
        Ok(self.filtered_users(filter).len() as i64)
    }

    #[instrument(skip(self), err)]
    async fn delete_user(&self, id: UserId) -> Result<bool> {
        let owns_records = self.ngos.iter().any(|n| n.created_by == id);
        let owns_announcements = self.announcements.iter().any(|a| a.created_by == id);
        if owns_records || owns_announcements {
            return Err(DbError::ProtectedEntity {
                operation: Operation::Delete,
                reason: "the account still owns NGO records or announcements".to_string(),
                entity_type: "user".to_string(),
                entity_id: Some(id.to_string()),
            });
        }

        match self.users.remove(&id) {
            Some((_, user)) => {
                self.usernames.remove(&user.username.to_lowercase());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    #[instrument(skip(self), err)]
    async fn get_ngo(&self, id: NgoId) -> Result<Option<NgoDBResponse>> {
        Ok(self.ngos.get(&id).map(|n| n.value().clone()))
    }

    #[instrument(skip(self), err)]
    async fn get_ngos(&self, filter: &NgoFilter, skip: i64, limit: i64) -> Result<Vec<NgoDBResponse>> {
        Ok(page(self.filtered_ngos(filter), skip, limit))
    }

    #[instrument(skip(self), err)]
    async fn count_ngos(&self, filter: &NgoFilter) -> Result<i64> {
        Ok(self.filtered_ngos(filter).len() as i64)
    }

    #[instrument(skip(self, request), fields(created_by = request.created_by), err)]
    async fn create_ngo(&self, request: &NgoCreateDBRequest) -> Result<NgoDBResponse> {
        let id = self.next_ngo_id.fetch_add(1, Ordering::SeqCst);
        let now = Utc::now();
        let record = NgoDBResponse {
            id,
            created_by: request.created_by,
            profile: request.profile.clone(),
            details: request.details.clone(),
            status: NgoStatus::Pending,
            approved_by_admin_id: None,
            approved_by_admin_at: None,
            approved_by_super_admin_id: None,
            approved_by_super_admin_at: None,
            rejected_by_id: None,
            rejected_at: None,
            rejection_reason: None,
            created_at: now,
            updated_at: now,
        };
        self.ngos.insert(id, record.clone());
        Ok(record)
    }

    #[instrument(skip(self, request), err)]
    async fn update_ngo(&self, id: NgoId, expected: NgoStatus, request: &NgoUpdateDBRequest) -> Result<NgoDBResponse> {
        let mut record = self.ngos.get_mut(&id).ok_or(DbError::NotFound)?;
        if record.status != expected {
            return Err(stale("NGO record", id));
        }
        *record = record.clone().with_update(request, Utc::now());
        Ok(record.clone())
    }

    #[instrument(skip(self, update), fields(status = %update.status), err)]
    async fn update_ngo_approval(&self, id: NgoId, expected: NgoStatus, update: &ApprovalDBUpdate) -> Result<NgoDBResponse> {
        let mut record = self.ngos.get_mut(&id).ok_or(DbError::NotFound)?;
        if record.status != expected {
            return Err(stale("NGO record", id));
        }
        *record = update.applied_to(record.clone());
        Ok(record.clone())
    }

    #[instrument(skip(self), err)]
    async fn delete_ngo(&self, id: NgoId) -> Result<bool> {
        Ok(self.ngos.remove(&id).is_some())
    }

    #[instrument(skip(self), err)]
    async fn list_announcements(&self, include_drafts: bool) -> Result<Vec<AnnouncementDBResponse>> {
        let mut announcements: Vec<_> = self
            .announcements
            .iter()
            .filter(|a| include_drafts || a.published)
            .map(|a| a.value().clone())
            .collect();
        announcements.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(announcements)
    }

    #[instrument(skip(self), err)]
    async fn get_announcement(&self, id: AnnouncementId) -> Result<Option<AnnouncementDBResponse>> {
        Ok(self.announcements.get(&id).map(|a| a.value().clone()))
    }

    #[instrument(skip(self, request), err)]
    async fn create_announcement(&self, request: &AnnouncementCreateDBRequest) -> Result<AnnouncementDBResponse> {
        let id = self.next_announcement_id.fetch_add(1, Ordering::SeqCst);
        let now = Utc::now();
        let announcement = AnnouncementDBResponse {
            id,
            title: request.title.clone(),
            body: request.body.clone(),
            published: request.published,
            created_by: request.created_by,
            created_at: now,
            updated_at: now,
        };
        self.announcements.insert(id, announcement.clone());
        Ok(announcement)
    }

    #[instrument(skip(self, request), err)]
    async fn update_announcement(
        &self,
        id: AnnouncementId,
        request: &AnnouncementUpdateDBRequest,
    ) -> Result<AnnouncementDBResponse> {
        let mut announcement = self.announcements.get_mut(&id).ok_or(DbError::NotFound)?;
        if let Some(title) = &request.title {
            announcement.title = title.clone();
        }
        if let Some(body) = &request.body {
            announcement.body = body.clone();
        }
        if let Some(published) = request.published {
            announcement.published = published;
        }
        announcement.updated_at = Utc::now();
        Ok(announcement.clone())
    }

    #[instrument(skip(self), err)]
    async fn delete_announcement(&self, id: AnnouncementId) -> Result<bool> {
        Ok(self.announcements.remove(&id).is_some())
    }
}
