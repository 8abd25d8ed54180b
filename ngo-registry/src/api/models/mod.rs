//! API request and response data models.
//!
//! These structures define the public JSON contract and are kept separate from the storage
//! models in [`crate::db::models`], so the wire format can evolve independently of the
//! schema. JSON keys are camelCase; enum values are snake_case.
//!
//! - [`ngos`]: organization profiles, sensitive details and review requests
//! - [`users`]: account profiles and admin role/status changes
//! - [`auth`]: registration, login and password change payloads
//! - [`announcements`]: portal news items
//! - [`pagination`]: shared `skip`/`limit` handling

pub mod announcements;
pub mod auth;
pub mod ngos;
pub mod pagination;
pub mod users;
