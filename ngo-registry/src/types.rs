//! Common type definitions shared by the storage, auth and API layers.
//!
//! This module defines:
//! - Type aliases for entity IDs ([`UserId`], [`NgoId`], [`AnnouncementId`])
//! - The account enums [`Role`] and [`UserStatus`]
//! - The review lifecycle enum [`NgoStatus`]
//! - [`Operation`], used when reporting refused actions
//!
//! All IDs are storage-assigned, incrementing 64-bit integers.

use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

// Type aliases for IDs
pub type UserId = i64;
pub type NgoId = i64;
pub type AnnouncementId = i64;

/// Platform-wide role of an account.
///
/// Capabilities are nested: everything an admin may read, a super admin may read too.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash, ToSchema)]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Admin,
    SuperAdmin,
}

impl Role {
    /// Admins and super admins review NGO records and see sensitive details.
    pub fn is_reviewer(self) -> bool {
        matches!(self, Role::Admin | Role::SuperAdmin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Admin => write!(f, "admin"),
            Role::SuperAdmin => write!(f, "super_admin"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash, ToSchema)]
#[sqlx(type_name = "user_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    Active,
    Suspended,
}

/// Review status of an NGO record.
///
/// See [`crate::approval`] for the transitions between these states.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash, ToSchema)]
#[sqlx(type_name = "ngo_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NgoStatus {
    Pending,
    AdminApproved,
    Approved,
    Rejected,
}

impl fmt::Display for NgoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NgoStatus::Pending => write!(f, "pending"),
            NgoStatus::AdminApproved => write!(f, "admin_approved"),
            NgoStatus::Approved => write!(f, "approved"),
            NgoStatus::Rejected => write!(f, "rejected"),
        }
    }
}

// Operations reported back to callers when an action is refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
    Review,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Create => write!(f, "create"),
            Operation::Read => write!(f, "read"),
            Operation::Update => write!(f, "update"),
            Operation::Delete => write!(f, "delete"),
            Operation::Review => write!(f, "review"),
        }
    }
}
