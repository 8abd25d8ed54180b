//! Storage record models.
//!
//! These structs are what the [`crate::db::storage::Storage`] backends accept and return.
//! They are kept separate from the API models in [`crate::api::models`] so that storage and
//! wire representations can evolve independently; conversions live on the API side
//! (`From<UserDBResponse> for UserResponse`, [`NgoResponse::for_viewer`], ...).
//!
//! [`NgoResponse::for_viewer`]: crate::api::models::ngos::NgoResponse::for_viewer
//!
//! - [`users`]: accounts, roles and suspension state
//! - [`ngos`]: organization records, content updates and review decisions
//! - [`announcements`]: portal news items

pub mod announcements;
pub mod ngos;
pub mod users;
