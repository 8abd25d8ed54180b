//! Authentication and authorization.
//!
//! Browsers authenticate with a session cookie issued by `POST /api/auth/login`. The cookie
//! holds an opaque id; the session itself lives server-side in [`session::SessionStore`]
//! and expires a fixed time after login.
//!
//! - [`current_user`]: extractors resolving the caller (`CurrentUser`, `MaybeUser`,
//!   `RequiresAdmin`, `RequiresSuperAdmin`)
//! - [`permissions`]: role gates and record-level access checks
//! - [`password`]: Argon2id hashing and verification
//! - [`session`]: session store and cookie helpers
//!
//! ```ignore
//! async fn review_queue(RequiresAdmin(admin): RequiresAdmin, State(state): State<AppState>) -> Result<...> {
//!     // only admins and super admins get here
//! }
//! ```

pub mod current_user;
pub mod password;
pub mod permissions;
pub mod session;
