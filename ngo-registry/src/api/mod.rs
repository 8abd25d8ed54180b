//! HTTP API: route handlers and wire models.
//!
//! - **[`handlers`]**: Axum route handlers
//! - **[`models`]**: request/response data structures
//!
//! # API Structure
//!
//! - **Authentication** (`/api/auth/*`): registration, login, logout, own profile
//! - **Public directory** (`/api/public/ngos`): approved organizations, no sign-in needed
//! - **NGO records** (`/api/ngos/*`): registration forms and the review workflow
//! - **User administration** (`/api/admin/users/*`, `/api/super-admin/users/*`)
//! - **Announcements** (`/api/announcements/*`)
//!
//! OpenAPI documentation is served at `/api/docs`.

pub mod handlers;
pub mod models;
