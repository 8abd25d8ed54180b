//! API request/response models for portal announcements.

use crate::db::models::announcements::AnnouncementDBResponse;
use crate::errors::Error;
use crate::types::{AnnouncementId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AnnouncementCreate {
    pub title: String,
    pub body: String,
    /// Drafts are only visible to admins
    #[serde(default)]
    pub published: bool,
}

impl AnnouncementCreate {
    pub fn validate(&self) -> Result<(), Error> {
        if self.title.trim().is_empty() {
            return Err(Error::BadRequest {
                message: "Announcement title is required".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct AnnouncementUpdate {
    pub title: Option<String>,
    pub body: Option<String>,
    pub published: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnnouncementResponse {
    pub id: AnnouncementId,
    pub title: String,
    pub body: String,
    pub published: bool,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<AnnouncementDBResponse> for AnnouncementResponse {
    fn from(db: AnnouncementDBResponse) -> Self {
        Self {
            id: db.id,
            title: db.title,
            body: db.body,
            published: db.published,
            created_by: db.created_by,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ListAnnouncementsQuery {
    /// Include unpublished drafts (admins only, ignored for everyone else)
    #[serde(default)]
    pub include_drafts: bool,
}
