//! Database models for announcements.

use crate::api::models::announcements::{AnnouncementCreate, AnnouncementUpdate};
use crate::types::{AnnouncementId, UserId};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct AnnouncementCreateDBRequest {
    pub created_by: UserId,
    pub title: String,
    pub body: String,
    pub published: bool,
}

impl AnnouncementCreateDBRequest {
    pub fn new(created_by: UserId, create: AnnouncementCreate) -> Self {
        Self {
            created_by,
            title: create.title,
            body: create.body,
            published: create.published,
        }
    }
}

/// `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct AnnouncementUpdateDBRequest {
    pub title: Option<String>,
    pub body: Option<String>,
    pub published: Option<bool>,
}

impl From<AnnouncementUpdate> for AnnouncementUpdateDBRequest {
    fn from(update: AnnouncementUpdate) -> Self {
        Self {
            title: update.title,
            body: update.body,
            published: update.published,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AnnouncementDBResponse {
    pub id: AnnouncementId,
    pub title: String,
    pub body: String,
    pub published: bool,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
