//! Review workflow for NGO records.
//!
//! A record passes two review tiers before it is publicly listed:
//!
//! ```text
//!             admin approves            super admin approves
//!   Pending ─────────────────▶ AdminApproved ─────────────────▶ Approved
//!      │                             │
//!      │ admin rejects               │ super admin rejects
//!      ▼                             ▼
//!   Rejected ◀───────────────────────┘
//! ```
//!
//! Every permitted move is one row of [`TRANSITIONS`]; anything not listed there is refused.
//! The only other way a status changes is [`review_after_edit`]: when an owner edits an
//! approved record it goes back to `Pending` for another review round.

use crate::db::models::ngos::{ApprovalDBUpdate, NgoDBResponse, ReviewStamp};
use crate::types::{NgoStatus, Role, UserId};
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewAction {
    Approve,
    Reject,
}

/// Audit slot written by a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    AdminApproval,
    SuperAdminApproval,
    Rejection,
}

struct Rule {
    role: Role,
    from: NgoStatus,
    action: ReviewAction,
    to: NgoStatus,
    slot: Slot,
}

/// (caller role, current status, action) → (resulting status, audit slot)
const TRANSITIONS: &[Rule] = &[
    Rule {
        role: Role::Admin,
        from: NgoStatus::Pending,
        action: ReviewAction::Approve,
        to: NgoStatus::AdminApproved,
        slot: Slot::AdminApproval,
    },
    Rule {
        role: Role::Admin,
        from: NgoStatus::Pending,
        action: ReviewAction::Reject,
        to: NgoStatus::Rejected,
        slot: Slot::Rejection,
    },
    Rule {
        role: Role::SuperAdmin,
        from: NgoStatus::AdminApproved,
        action: ReviewAction::Approve,
        to: NgoStatus::Approved,
        slot: Slot::SuperAdminApproval,
    },
    Rule {
        role: Role::SuperAdmin,
        from: NgoStatus::AdminApproved,
        action: ReviewAction::Reject,
        to: NgoStatus::Rejected,
        slot: Slot::Rejection,
    },
];

/// The account performing a review.
#[derive(Debug, Clone, Copy)]
pub struct Reviewer {
    pub id: UserId,
    pub role: Role,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApprovalError {
    #[error("role {role} cannot review NGO records")]
    Forbidden { role: Role },

    #[error("Reviewers cannot review an NGO they submitted")]
    OwnRecord,

    #[error("A rejection reason is required when rejecting an NGO")]
    MissingReason,

    #[error("{}", transition_message(.role, .from, .requested))]
    InvalidTransition {
        role: Role,
        from: NgoStatus,
        requested: NgoStatus,
    },
}

fn transition_message(role: &Role, from: &NgoStatus, requested: &NgoStatus) -> String {
    match (role, from) {
        (Role::SuperAdmin, NgoStatus::Pending) => "An admin must approve this NGO first".to_string(),
        (Role::Admin, NgoStatus::AdminApproved) => "This NGO is awaiting super admin review".to_string(),
        (_, NgoStatus::Approved | NgoStatus::Rejected) => format!("This NGO has already been {from}"),
        _ => format!("Cannot move an NGO from {from} to {requested} as {role}"),
    }
}

/// Decide a review request against the transition table.
///
/// A requested status of `Rejected` is a reject action and needs a non-blank reason; any
/// other requested status is an approve action and must equal the table's approve result
/// for the (role, status) pair. The returned update stamps exactly one audit slot.
pub fn transition(
    record: &NgoDBResponse,
    reviewer: &Reviewer,
    requested: NgoStatus,
    reason: Option<&str>,
    now: DateTime<Utc>,
) -> Result<ApprovalDBUpdate, ApprovalError> {
    if !reviewer.role.is_reviewer() {
        return Err(ApprovalError::Forbidden { role: reviewer.role });
    }
    // Covers owners promoted after submitting
    if reviewer.id == record.created_by {
        return Err(ApprovalError::OwnRecord);
    }

    let action = match requested {
        NgoStatus::Rejected => ReviewAction::Reject,
        _ => ReviewAction::Approve,
    };

    let reason = match action {
        ReviewAction::Reject => Some(
            reason
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .ok_or(ApprovalError::MissingReason)?
                .to_string(),
        ),
        ReviewAction::Approve => None,
    };

    let rule = TRANSITIONS
        .iter()
        .find(|rule| rule.role == reviewer.role && rule.from == record.status && rule.action == action && rule.to == requested)
        .ok_or(ApprovalError::InvalidTransition {
            role: reviewer.role,
            from: record.status,
            requested,
        })?;

    let stamp = match (rule.slot, reason) {
        (Slot::AdminApproval, _) => ReviewStamp::AdminApproval { by: reviewer.id, at: now },
        (Slot::SuperAdminApproval, _) => ReviewStamp::SuperAdminApproval { by: reviewer.id, at: now },
        (Slot::Rejection, reason) => ReviewStamp::Rejection {
            by: reviewer.id,
            at: now,
            reason: reason.unwrap_or_default(),
        },
    };

    Ok(ApprovalDBUpdate { status: rule.to, stamp })
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum EditError {
    #[error("This NGO is under review and cannot be edited until the review completes")]
    UnderReview,

    #[error("Rejected NGO records cannot be edited")]
    Rejected,
}

/// Decide whether an edit is allowed and whether it sends the record back to review.
///
/// Reviewers may edit in any status without changing it. Owners may only edit approved
/// records, which then return to `Pending`.
pub fn review_after_edit(status: NgoStatus, editor: Role) -> Result<bool, EditError> {
    if editor.is_reviewer() {
        return Ok(false);
    }
    match status {
        NgoStatus::Pending | NgoStatus::AdminApproved => Err(EditError::UnderReview),
        NgoStatus::Approved => Ok(true),
        NgoStatus::Rejected => Err(EditError::Rejected),
    }
}
