//! Access-control gates.
//!
//! Capability levels are nested: anonymous < user < admin < super admin. The extractors in
//! [`super::current_user`] call the `require_*` gates; handlers call the record-level checks
//! after loading the record.

use crate::api::models::users::CurrentUser;
use crate::db::models::ngos::NgoDBResponse;
use crate::errors::{Error, Result};
use crate::types::{NgoStatus, Role};

pub fn require_auth(user: Option<CurrentUser>) -> Result<CurrentUser> {
    user.ok_or(Error::Unauthenticated { message: None })
}

pub fn require_admin(user: Option<CurrentUser>) -> Result<CurrentUser> {
    let user = require_auth(user)?;
    if !user.role.is_reviewer() {
        return Err(Error::Forbidden {
            message: "Admin access required".to_string(),
        });
    }
    Ok(user)
}

pub fn require_super_admin(user: Option<CurrentUser>) -> Result<CurrentUser> {
    let user = require_auth(user)?;
    if user.role != Role::SuperAdmin {
        return Err(Error::Forbidden {
            message: "Super admin access required".to_string(),
        });
    }
    Ok(user)
}

pub fn is_owner(user: &CurrentUser, record: &NgoDBResponse) -> bool {
    record.created_by == user.id
}

/// Only the creator or a reviewer may change a record.
pub fn ensure_owner_or_reviewer(user: &CurrentUser, record: &NgoDBResponse) -> Result<()> {
    if is_owner(user, record) || user.is_reviewer() {
        Ok(())
    } else {
        Err(Error::Forbidden {
            message: "Only the organization's owner or an admin can change this record".to_string(),
        })
    }
}

/// Approved records are public; anything else is visible to its owner and reviewers only.
pub fn can_view_record(viewer: Option<&CurrentUser>, record: &NgoDBResponse) -> bool {
    record.status == NgoStatus::Approved || viewer.is_some_and(|user| is_owner(user, record) || user.is_reviewer())
}
