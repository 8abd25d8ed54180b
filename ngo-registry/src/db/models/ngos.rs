//! Database models for NGO records.

use crate::api::models::ngos::{NgoCreate, NgoDetails, NgoProfile, NgoUpdate};
use crate::types::{NgoId, NgoStatus, UserId};
use chrono::{DateTime, Utc};

/// Database request for creating a new NGO record. Records always start out `Pending`.
#[derive(Debug, Clone)]
pub struct NgoCreateDBRequest {
    pub created_by: UserId,
    pub profile: NgoProfile,
    pub details: NgoDetails,
}

impl NgoCreateDBRequest {
    pub fn new(created_by: UserId, create: NgoCreate) -> Self {
        Self {
            created_by,
            profile: create.profile,
            details: create.details,
        }
    }
}

/// Database request for replacing a record's content.
#[derive(Debug, Clone)]
pub struct NgoUpdateDBRequest {
    pub profile: NgoProfile,
    /// `None` keeps the stored details
    pub details: Option<NgoDetails>,
    /// Send the record back to `Pending` and clear every review stamp
    pub reset_review: bool,
}

impl NgoUpdateDBRequest {
    pub fn new(update: NgoUpdate, reset_review: bool) -> Self {
        Self {
            profile: update.profile,
            details: update.details,
            reset_review,
        }
    }
}

/// Filter for listing NGO records
#[derive(Debug, Clone, Default)]
pub struct NgoFilter {
    pub status: Option<NgoStatus>,
    pub created_by: Option<UserId>,
    /// Case-insensitive substring over name, description and areas of activity
    pub search: Option<String>,
    pub city: Option<String>,
}

impl NgoFilter {
    pub fn with_status(status: NgoStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn created_by(user_id: UserId) -> Self {
        Self {
            created_by: Some(user_id),
            ..Default::default()
        }
    }

    /// In-memory equivalent of the SQL predicate used by the PostgreSQL backend.
    pub fn matches(&self, record: &NgoDBResponse) -> bool {
        if let Some(status) = self.status
            && record.status != status
        {
            return false;
        }
        if let Some(created_by) = self.created_by
            && record.created_by != created_by
        {
            return false;
        }
        if let Some(city) = &self.city {
            let city = city.trim().to_lowercase();
            let matches_city = record
                .profile
                .city
                .as_deref()
                .is_some_and(|c| c.to_lowercase() == city);
            if !matches_city {
                return false;
            }
        }
        if let Some(search) = &self.search {
            let needle = search.trim().to_lowercase();
            let profile = &record.profile;
            let hit = profile.name.to_lowercase().contains(&needle)
                || profile
                    .description
                    .as_deref()
                    .is_some_and(|d| d.to_lowercase().contains(&needle))
                || profile.areas_of_activity.iter().any(|a| a.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }
        true
    }
}

/// Database response for an NGO record
#[derive(Debug, Clone, PartialEq)]
pub struct NgoDBResponse {
    pub id: NgoId,
    pub created_by: UserId,
    pub profile: NgoProfile,
    pub details: NgoDetails,
    pub status: NgoStatus,
    pub approved_by_admin_id: Option<UserId>,
    pub approved_by_admin_at: Option<DateTime<Utc>>,
    pub approved_by_super_admin_id: Option<UserId>,
    pub approved_by_super_admin_at: Option<DateTime<Utc>>,
    pub rejected_by_id: Option<UserId>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NgoDBResponse {
    /// Apply a content update, including the optional review reset.
    pub fn with_update(mut self, request: &NgoUpdateDBRequest, now: DateTime<Utc>) -> Self {
        self.profile = request.profile.clone();
        if let Some(details) = &request.details {
            self.details = details.clone();
        }
        if request.reset_review {
            self.status = NgoStatus::Pending;
            self.approved_by_admin_id = None;
            self.approved_by_admin_at = None;
            self.approved_by_super_admin_id = None;
            self.approved_by_super_admin_at = None;
            self.rejected_by_id = None;
            self.rejected_at = None;
            self.rejection_reason = None;
        }
        self.updated_at = now;
        self
    }
}

/// The audit slot a review decision writes to.
#[derive(Debug, Clone, PartialEq)]
pub enum ReviewStamp {
    AdminApproval { by: UserId, at: DateTime<Utc> },
    SuperAdminApproval { by: UserId, at: DateTime<Utc> },
    Rejection { by: UserId, at: DateTime<Utc>, reason: String },
}

/// Database request for a review decision, as produced by [`crate::approval::transition`].
///
/// Applying it sets the status and exactly one audit slot; the other slots are left alone.
#[derive(Debug, Clone, PartialEq)]
pub struct ApprovalDBUpdate {
    pub status: NgoStatus,
    pub stamp: ReviewStamp,
}

impl ApprovalDBUpdate {
    pub fn applied_to(&self, mut record: NgoDBResponse) -> NgoDBResponse {
        record.status = self.status;
        match &self.stamp {
            ReviewStamp::AdminApproval { by, at } => {
                record.approved_by_admin_id = Some(*by);
                record.approved_by_admin_at = Some(*at);
                record.updated_at = *at;
            }
            ReviewStamp::SuperAdminApproval { by, at } => {
                record.approved_by_super_admin_id = Some(*by);
                record.approved_by_super_admin_at = Some(*at);
                record.updated_at = *at;
            }
            ReviewStamp::Rejection { by, at, reason } => {
                record.rejected_by_id = Some(*by);
                record.rejected_at = Some(*at);
                record.rejection_reason = Some(reason.clone());
                record.updated_at = *at;
            }
        }
        record
    }
}
