//! Test utilities shared by the unit and handler tests.

use crate::api::models::ngos::{Employee, NgoCreate, NgoDetails, NgoProfile};
use crate::auth::password::{self, Argon2Params};
use crate::auth::session::SessionStore;
use crate::config::{Config, DatabaseConfig, PasswordConfig};
use crate::db::memory::MemoryStorage;
use crate::db::models::ngos::NgoDBResponse;
use crate::db::models::users::{UserCreateDBRequest, UserDBResponse};
use crate::types::{NgoId, NgoStatus, Role, UserId};
use crate::AppState;
use axum_test::TestServer;
use chrono::Utc;
use std::sync::Arc;

/// Password given to every account created by [`create_test_user`].
pub const TEST_PASSWORD: &str = "correct-horse-battery";

pub fn create_test_config() -> Config {
    let mut config = Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        database: DatabaseConfig::Memory,
        super_admin_password: None,
        ..Default::default()
    };
    // Cheap hashing keeps the suite fast
    config.auth.password = PasswordConfig {
        argon2_memory_kib: 1024,
        argon2_iterations: 1,
        argon2_parallelism: 1,
        ..Default::default()
    };
    config.auth.session.cookie_secure = false;
    config
}

pub fn create_test_state_with_config(config: Config) -> AppState {
    AppState::builder()
        .storage(Arc::new(MemoryStorage::new()))
        .sessions(Arc::new(SessionStore::new(config.auth.session.timeout)))
        .config(config)
        .build()
}

pub fn create_test_state() -> AppState {
    create_test_state_with_config(create_test_config())
}

/// Full router over a fresh memory-backed state.
pub fn create_test_server(state: &AppState) -> TestServer {
    let router = crate::build_router(state).expect("Failed to build router");
    TestServer::new(router).expect("Failed to create test server")
}

pub fn user_create_request(username: &str, role: Role) -> UserCreateDBRequest {
    UserCreateDBRequest {
        username: username.to_string(),
        email: Some(format!("{username}@example.org")),
        display_name: None,
        password_hash: "not-a-real-hash".to_string(),
        role,
    }
}

/// Store an account whose password is [`TEST_PASSWORD`].
pub async fn create_test_user(state: &AppState, username: &str, role: Role) -> UserDBResponse {
    let params = Argon2Params::from(&state.config.auth.password);
    let password_hash = password::hash_string_with_params(TEST_PASSWORD, Some(params)).expect("Failed to hash test password");
    let request = UserCreateDBRequest {
        password_hash,
        ..user_create_request(username, role)
    };
    state.storage.create_user(&request).await.expect("Failed to create test user")
}

/// Start a session for `user_id` and return the matching `Cookie` header value.
pub fn session_cookie(state: &AppState, user_id: UserId) -> String {
    let session = state.sessions.create(user_id);
    format!("{}={}", state.config.auth.session.cookie_name, session.id)
}

pub fn sample_ngo_create(name: &str, city: &str) -> NgoCreate {
    NgoCreate {
        profile: NgoProfile {
            name: name.to_string(),
            registration_number: format!("REG-{}", name.len()),
            description: Some(format!("{name} supports local communities")),
            city: Some(city.to_string()),
            email: Some("office@example.org".to_string()),
            founded_year: Some(2010),
            areas_of_activity: vec!["education".to_string(), "environment".to_string()],
            ..Default::default()
        },
        details: sample_details(),
    }
}

fn sample_details() -> NgoDetails {
    NgoDetails {
        employees: vec![Employee {
            full_name: "Ana Kovač".to_string(),
            position: Some("Director".to_string()),
            phone: None,
        }],
        ..Default::default()
    }
}

/// A freshly submitted record, as storage would return it.
pub fn sample_ngo_record(id: NgoId, created_by: UserId) -> NgoDBResponse {
    let now = Utc::now();
    let create = sample_ngo_create("Green Valley", "Sarajevo");
    NgoDBResponse {
        id,
        created_by,
        profile: create.profile,
        details: create.details,
        status: NgoStatus::Pending,
        approved_by_admin_id: None,
        approved_by_admin_at: None,
        approved_by_super_admin_id: None,
        approved_by_super_admin_at: None,
        rejected_by_id: None,
        rejected_at: None,
        rejection_reason: None,
        created_at: now,
        updated_at: now,
    }
}
