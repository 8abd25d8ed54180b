//! Storage layer.
//!
//! Handlers only ever see the [`storage::Storage`] trait, held in
//! [`AppState`](crate::AppState) as `Arc<dyn Storage>`. Two backends implement it:
//!
//! ```text
//! ┌─────────────┐
//! │  Handlers   │  (api::handlers)
//! └──────┬──────┘
//!        │  Arc<dyn Storage>
//!        ↓
//! ┌─────────────┬──────────────┐
//! │ PgStorage   │ MemoryStorage│
//! │ (postgres)  │ (memory)     │
//! └─────────────┴──────────────┘
//! ```
//!
//! - [`models`]: records exchanged with the backends
//! - [`errors`]: backend-independent error type
//! - [`postgres`]: SQLx PostgreSQL backend, schema in `migrations/`
//! - [`memory`]: process-local backend used by tests and `database.type: memory`
//!
//! Every single-record write is atomic. NGO writes are conditional on the status the
//! caller read, so two reviewers racing on one record cannot both win.

pub mod errors;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod storage;
