//! HTTP request handlers for all API endpoints.
//!
//! Handlers are organized by resource type. Each one:
//! - extracts the caller through the [`crate::auth::current_user`] extractors
//! - validates the request
//! - applies business rules ([`crate::approval`], [`crate::auth::permissions`])
//! - talks to storage through [`crate::db::storage::Storage`]
//!
//! # Handler Modules
//!
//! - [`auth`]: registration, login, logout and the caller's own account
//! - [`ngos`]: public directory, NGO records and review decisions
//! - [`users`]: account administration
//! - [`announcements`]: portal news

pub mod announcements;
pub mod auth;
pub mod ngos;
pub mod users;
