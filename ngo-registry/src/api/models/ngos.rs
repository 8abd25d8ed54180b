//! API request/response models for NGO records.

use super::pagination::Pagination;
use crate::db::models::ngos::NgoDBResponse;
use crate::errors::Error;
use crate::types::{NgoId, NgoStatus, Role, UserId};
use chrono::{DateTime, Datelike, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Publicly listed part of an organization's profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NgoProfile {
    pub name: String,
    pub registration_number: String,
    pub legal_form: Option<String>,
    pub description: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    pub founded_year: Option<i32>,
    #[serde(default)]
    pub areas_of_activity: Vec<String>,
}

impl NgoProfile {
    /// Check the required fields and the shape of the optional ones.
    pub fn validate(&self) -> Result<(), Error> {
        if self.name.trim().is_empty() {
            return Err(Error::BadRequest {
                message: "Organization name is required".to_string(),
            });
        }
        if self.registration_number.trim().is_empty() {
            return Err(Error::BadRequest {
                message: "Registration number is required".to_string(),
            });
        }
        if let Some(email) = &self.email
            && !email.contains('@')
        {
            return Err(Error::BadRequest {
                message: format!("Invalid contact email: {email}"),
            });
        }
        if let Some(year) = self.founded_year {
            let current_year = Utc::now().year();
            if !(1800..=current_year).contains(&year) {
                return Err(Error::BadRequest {
                    message: format!("Founded year must be between 1800 and {current_year}"),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    pub full_name: String,
    pub position: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Volunteer {
    pub full_name: String,
    pub activity: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BankAccount {
    pub bank_name: String,
    pub account_number: String,
    pub currency: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
    pub kind: String,
    pub plate_number: String,
    pub ownership: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RealEstate {
    pub address: String,
    pub ownership: Option<String>,
    pub area_square_meters: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FinancialRecord {
    pub year: i32,
    pub income: Decimal,
    pub expenses: Decimal,
    #[serde(default)]
    pub funding_sources: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnnualPlan {
    pub year: i32,
    pub title: String,
    pub description: Option<String>,
}

/// Sensitive sub-collections of a profile.
///
/// Only admins and super admins ever receive this block; it is omitted from every other
/// response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct NgoDetails {
    pub employees: Vec<Employee>,
    pub volunteers: Vec<Volunteer>,
    pub bank_accounts: Vec<BankAccount>,
    pub vehicles: Vec<Vehicle>,
    pub real_estate: Vec<RealEstate>,
    pub financial_data: Vec<FinancialRecord>,
    pub annual_plans: Vec<AnnualPlan>,
}

/// Registration form submitted by an account holder.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NgoCreate {
    pub profile: NgoProfile,
    #[serde(default)]
    pub details: NgoDetails,
}

/// Replacement of a record's editable content.
///
/// Owners never see `details`, so leaving it out keeps the stored collections.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NgoUpdate {
    pub profile: NgoProfile,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<NgoDetails>,
}

/// Body of `PATCH /api/ngos/{id}/status`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NgoStatusUpdate {
    pub status: NgoStatus,
    pub rejection_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NgoResponse {
    pub id: NgoId,
    pub created_by: UserId,
    pub profile: NgoProfile,
    /// Present only for admin and super admin callers
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub details: Option<NgoDetails>,
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

impl NgoResponse {
    /// Build the response for a caller with the given role (`None` for anonymous callers).
    pub fn for_viewer(db: NgoDBResponse, viewer: Option<Role>) -> Self {
        let include_details = viewer.is_some_and(Role::is_reviewer);
        Self {
            id: db.id,
            created_by: db.created_by,
            profile: db.profile,
            details: include_details.then_some(db.details),
            status: db.status,
            approved_by_admin_id: db.approved_by_admin_id,
            approved_by_admin_at: db.approved_by_admin_at,
            approved_by_super_admin_id: db.approved_by_super_admin_id,
            approved_by_super_admin_at: db.approved_by_super_admin_at,
            rejected_by_id: db.rejected_by_id,
            rejected_at: db.rejected_at,
            rejection_reason: db.rejection_reason,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

/// Query parameters for `GET /api/ngos`
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ListNgosQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    /// Only return records in this review status (ignored for non-admin callers)
    pub status: Option<NgoStatus>,
}

/// Query parameters for the public directory
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PublicDirectoryQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    /// Case-insensitive substring match against name, description and areas of activity
    pub search: Option<String>,

    /// Exact (case-insensitive) city match
    pub city: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::sample_ngo_record;

    #[test]
    fn test_details_visible_to_reviewers_only() {
        let record = sample_ngo_record(1, 7);

        let anonymous = serde_json::to_value(NgoResponse::for_viewer(record.clone(), None)).unwrap();
        assert!(anonymous.get("details").is_none());

        let user = serde_json::to_value(NgoResponse::for_viewer(record.clone(), Some(Role::User))).unwrap();
        assert!(user.get("details").is_none());

        let admin = serde_json::to_value(NgoResponse::for_viewer(record.clone(), Some(Role::Admin))).unwrap();
        assert_eq!(admin["details"]["employees"][0]["fullName"], "Ana Kovač");

        let super_admin = NgoResponse::for_viewer(record, Some(Role::SuperAdmin));
        assert!(super_admin.details.is_some());
    }

    #[test]
    fn test_profile_validation() {
        let mut profile = NgoProfile {
            name: "Green Valley".to_string(),
            registration_number: "REG-001".to_string(),
            ..Default::default()
        };
        assert!(profile.validate().is_ok());

        profile.email = Some("not-an-email".to_string());
        assert!(profile.validate().is_err());

        profile.email = Some("office@greenvalley.org".to_string());
        profile.founded_year = Some(1750);
        assert!(profile.validate().is_err());

        profile.founded_year = Some(2001);
        profile.name = "   ".to_string();
        let err = profile.validate().unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_status_update_uses_camel_case() {
        let body: NgoStatusUpdate =
            serde_json::from_str(r#"{"status":"rejected","rejectionReason":"Incomplete documents"}"#).unwrap();
        assert_eq!(body.status, NgoStatus::Rejected);
        assert_eq!(body.rejection_reason.as_deref(), Some("Incomplete documents"));

        let body: NgoStatusUpdate = serde_json::from_str(r#"{"status":"admin_approved"}"#).unwrap();
        assert_eq!(body.status, NgoStatus::AdminApproved);
        assert!(body.rejection_reason.is_none());
    }
}
