//! # ngo-registry: NGO Registration Portal Backend
//!
//! `ngo-registry` is the backend of a portal where non-governmental organizations register
//! themselves and get listed in a public directory once two tiers of reviewers have signed
//! off.
//!
//! ## Overview
//!
//! Visitors browse the public directory of approved organizations. Account holders submit a
//! registration form describing their organization (profile, employees, volunteers, bank
//! accounts, vehicles, real estate, financial data and annual plans). Every submission starts
//! out `pending`; an admin then approves or rejects it, and an approved record goes on to a
//! super admin for the final decision. Only fully approved records appear publicly, and the
//! sensitive sub-collections are never shown to anyone but reviewers.
//!
//! ## Architecture
//!
//! The HTTP layer is [Axum](https://github.com/tokio-rs/axum). Storage sits behind the
//! [`db::storage::Storage`] trait with a PostgreSQL backend for production and an in-memory
//! backend for tests and demos.
//!
//! ### Core Components
//!
//! The **approval state machine** ([`approval`]) is a pure function over an explicit
//! transition table: (role, current status, action) to the resulting status plus exactly one
//! audit stamp. Handlers call it and hand the result to storage, which applies it only if the
//! record is still in the status the reviewer saw.
//!
//! The **authentication layer** ([`auth`]) keeps server-side sessions keyed by an opaque
//! cookie, hashes passwords with Argon2id and provides extractors that gate handlers by role.
//!
//! The **API layer** ([`api`]) exposes the public directory, the NGO workflow, account
//! administration and announcements under `/api`.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use ngo_registry::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = ngo_registry::config::Args::parse();
//!     let config = Config::load(&args)?;
//!     ngo_registry::telemetry::init_telemetry(config.enable_otel_export)?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     })
//!     .await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.
pub mod api;
pub mod approval;
pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
mod openapi;
pub mod telemetry;
pub mod types;

#[cfg(test)]
pub mod test_utils;

use crate::{
    auth::{
        password::{self, Argon2Params},
        session::SessionStore,
    },
    config::{CorsOrigin, DatabaseConfig},
    db::{
        memory::MemoryStorage,
        models::users::{UserCreateDBRequest, UserUpdateDBRequest},
        postgres::PgStorage,
        storage::Storage,
    },
    openapi::ApiDoc,
    types::{Role, UserId, UserStatus},
};
use axum::{
    Router, http,
    http::HeaderValue,
    routing::{get, patch, post},
};
use axum_prometheus::PrometheusMetricLayer;
use bon::Builder;
pub use config::Config;
use sqlx::{PgPool, postgres::PgPoolOptions};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

/// Application state shared across all request handlers.
///
/// - `storage`: the active storage backend
/// - `sessions`: live login sessions
/// - `config`: configuration loaded at startup
#[derive(Clone, Builder)]
pub struct AppState {
    pub storage: Arc<dyn Storage>,
    pub sessions: Arc<SessionStore>,
    pub config: Config,
}

/// Get the database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Ensure the configured super admin account exists.
///
/// Idempotent: a missing account is created, an existing one gets the configured password,
/// the super admin role and active status back. Without a configured password nothing
/// happens and `None` is returned.
#[instrument(skip_all)]
pub async fn bootstrap_super_admin(storage: &dyn Storage, config: &Config) -> anyhow::Result<Option<UserId>> {
    let Some(password) = config.super_admin_password.clone() else {
        info!("No super_admin_password configured, skipping super admin bootstrap");
        return Ok(None);
    };
    let username = config.super_admin_username.trim();
    let password_hash = password::hash_blocking(password, Argon2Params::from(&config.auth.password)).await?;

    if let Some(existing) = storage.get_user_by_username(username).await? {
        let update = UserUpdateDBRequest {
            password_hash: Some(password_hash),
            role: Some(Role::SuperAdmin),
            status: Some(UserStatus::Active),
            ..Default::default()
        };
        storage.update_user(existing.id, &update).await?;
        info!(user_id = existing.id, "Super admin account refreshed");
        return Ok(Some(existing.id));
    }

    let created = storage
        .create_user(&UserCreateDBRequest {
            username: username.to_string(),
            email: None,
            display_name: Some("Super Admin".to_string()),
            password_hash,
            role: Role::SuperAdmin,
        })
        .await?;
    info!(user_id = created.id, "Super admin account created");
    Ok(Some(created.id))
}

fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let cors_config = &config.auth.cors;

    let allow_origin = if cors_config
        .allowed_origins
        .iter()
        .any(|origin| matches!(origin, CorsOrigin::Wildcard))
    {
        AllowOrigin::any()
    } else {
        let mut origins = Vec::new();
        for origin in &cors_config.allowed_origins {
            if let CorsOrigin::Url(url) = origin {
                // Browsers send the bare origin, without path or trailing slash
                origins.push(url.origin().ascii_serialization().parse::<HeaderValue>()?);
            }
        }
        AllowOrigin::list(origins)
    };

    let mut cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_credentials(cors_config.allow_credentials)
        .allow_methods([
            http::Method::GET,
            http::Method::POST,
            http::Method::PUT,
            http::Method::PATCH,
            http::Method::DELETE,
        ])
        .allow_headers([http::header::CONTENT_TYPE]);

    if let Some(max_age) = cors_config.max_age {
        cors = cors.max_age(std::time::Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Build the application router with all endpoints and middleware.
///
/// - Authentication, NGO, user administration and announcement routes under `/api`
/// - OpenAPI documentation at `/api/docs`
/// - Optional Prometheus metrics at `/internal/metrics`
/// - CORS and request tracing
#[instrument(skip_all)]
pub fn build_router(state: &AppState) -> anyhow::Result<Router> {
    use api::handlers::{announcements, auth, ngos, users};

    let auth_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me).patch(auth::update_me))
        .route("/auth/password-change", post(auth::change_password));

    let ngo_routes = Router::new()
        .route("/public/ngos", get(ngos::list_public_ngos))
        .route("/ngos", get(ngos::list_ngos).post(ngos::create_ngo))
        .route(
            "/ngos/{id}",
            get(ngos::get_ngo).put(ngos::update_ngo).delete(ngos::delete_ngo),
        )
        .route("/ngos/{id}/status", patch(ngos::update_ngo_status));

    let user_routes = Router::new()
        .route("/admin/users", get(users::list_users))
        .route("/admin/users/{id}/status", patch(users::update_user_status))
        .route("/super-admin/users/{id}/role", patch(users::update_user_role))
        .route("/super-admin/users/{id}", axum::routing::delete(users::delete_user));

    let announcement_routes = Router::new()
        .route(
            "/announcements",
            get(announcements::list_announcements).post(announcements::create_announcement),
        )
        .route(
            "/announcements/{id}",
            axum::routing::put(announcements::update_announcement).delete(announcements::delete_announcement),
        );

    let api_routes = Router::new()
        .merge(auth_routes)
        .merge(ngo_routes)
        .merge(user_routes)
        .merge(announcement_routes)
        .with_state(state.clone());

    let openapi = ApiDoc::openapi();
    let mut router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .nest("/api", api_routes)
        .route(
            "/api-docs/openapi.json",
            get({
                let openapi = openapi.clone();
                move || async move { axum::Json(openapi) }
            }),
        )
        .merge(Scalar::with_url("/api/docs", openapi));

    router = router.layer(create_cors_layer(&state.config)?);

    if state.config.enable_metrics {
        let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();
        router = router
            .route("/internal/metrics", get(|| async move { metric_handle.render() }))
            .layer(prometheus_layer);
    }

    let router = router.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::DEBUG))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    Ok(router)
}

/// Open the configured storage backend. PostgreSQL is migrated before use.
async fn setup_storage(config: &Config) -> anyhow::Result<(Arc<dyn Storage>, Option<PgPool>)> {
    match &config.database {
        DatabaseConfig::Memory => {
            info!("Using in-memory storage; data is lost on shutdown");
            Ok((Arc::new(MemoryStorage::new()), None))
        }
        DatabaseConfig::Postgres { url, pool } => {
            info!("Using PostgreSQL storage");
            let pg_pool = PgPoolOptions::new()
                .max_connections(pool.max_connections)
                .min_connections(pool.min_connections)
                .acquire_timeout(pool.acquire_timeout)
                .connect(url)
                .await?;
            migrator().run(&pg_pool).await?;
            Ok((Arc::new(PgStorage::new(pg_pool.clone())), Some(pg_pool)))
        }
    }
}

/// Main application struct that owns all resources.
///
/// 1. **Create**: [`Application::new`] opens storage, runs migrations and ensures the super
///    admin account
/// 2. **Serve**: [`Application::serve`] binds to a TCP port and starts handling requests
/// 3. **Shutdown**: when the shutdown future resolves, in-flight requests finish, then the
///    pool is closed and pending spans are flushed
pub struct Application {
    router: Router,
    config: Config,
    pool: Option<PgPool>,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting NGO registry with configuration: {:#?}", config);

        let (storage, pool) = setup_storage(&config).await?;
        bootstrap_super_admin(storage.as_ref(), &config).await?;

        let app_state = AppState::builder()
            .storage(storage)
            .sessions(Arc::new(SessionStore::new(config.auth.session.timeout)))
            .config(config.clone())
            .build();

        let router = build_router(&app_state)?;

        Ok(Self { router, config, pool })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "NGO registry listening on http://{}, available at http://localhost:{}",
            bind_addr, self.config.port
        );

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        if let Some(pool) = self.pool {
            info!("Closing database connections...");
            pool.close().await;
        }

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_utils::{create_test_config, create_test_server, create_test_state, session_cookie};
    use axum::http::StatusCode;
    use serde_json::{Value, json};

    #[tokio::test]
    async fn test_bootstrap_super_admin_is_idempotent() {
        let state = create_test_state();
        let mut config = create_test_config();

        assert!(bootstrap_super_admin(state.storage.as_ref(), &config).await.unwrap().is_none());

        config.super_admin_password = Some("first-password".to_string());
        let first = bootstrap_super_admin(state.storage.as_ref(), &config).await.unwrap().unwrap();

        config.super_admin_password = Some("second-password".to_string());
        let second = bootstrap_super_admin(state.storage.as_ref(), &config).await.unwrap().unwrap();
        assert_eq!(first, second);

        let user = state.storage.get_user(first).await.unwrap().unwrap();
        assert_eq!(user.username, "superadmin");
        assert_eq!(user.role, Role::SuperAdmin);
        assert!(password::verify_string("second-password", &user.password_hash).unwrap());
        assert!(!password::verify_string("first-password", &user.password_hash).unwrap());
    }

    #[tokio::test]
    async fn test_application_with_memory_storage() {
        let mut config = create_test_config();
        config.super_admin_password = Some("bootstrap-password".to_string());
        let server = Application::new(config).await.unwrap().into_test_server();

        server.get("/healthz").await.assert_text("OK");

        let response = server
            .post("/api/auth/login")
            .json(&json!({"username": "superadmin", "password": "bootstrap-password"}))
            .await;
        response.assert_status_ok();
        assert_eq!(response.json::<Value>()["user"]["role"], "super_admin");
    }

    #[tokio::test]
    async fn test_openapi_document_is_served() {
        let state = create_test_state();
        let server = create_test_server(&state);

        let doc: Value = server.get("/api-docs/openapi.json").await.json();
        assert!(doc["paths"]["/api/ngos/{id}/status"]["patch"].is_object());
        server.get("/api/docs").await.assert_status_ok();
    }

    /// The full review workflow: submit, two approvals, public listing.
    #[test_log::test(tokio::test)]
    async fn test_end_to_end_review_flow() {
        let state = create_test_state();
        let server = create_test_server(&state);

        let response = server
            .post("/api/auth/register")
            .json(&json!({"username": "hana", "password": "password123"}))
            .await;
        response.assert_status(StatusCode::CREATED);
        let hana_id = response.json::<Value>()["user"]["id"].as_i64().unwrap();
        let hana = session_cookie(&state, hana_id);

        let admin = crate::test_utils::create_test_user(&state, "admin", Role::Admin).await;
        let root = crate::test_utils::create_test_user(&state, "root", Role::SuperAdmin).await;

        let ngo: Value = server
            .post("/api/ngos")
            .add_header("cookie", &hana)
            .json(&crate::test_utils::sample_ngo_create("Green Valley", "Sarajevo"))
            .await
            .json();
        let id = ngo["id"].as_i64().unwrap();

        let directory: Value = server.get("/api/public/ngos").await.json();
        assert_eq!(directory["totalCount"], 0);

        for (cookie, status) in [
            (session_cookie(&state, admin.id), "admin_approved"),
            (session_cookie(&state, root.id), "approved"),
        ] {
            server
                .patch(&format!("/api/ngos/{id}/status"))
                .add_header("cookie", cookie)
                .json(&json!({ "status": status }))
                .await
                .assert_status_ok();
        }

        let directory: Value = server.get("/api/public/ngos").await.json();
        assert_eq!(directory["totalCount"], 1);
        assert_eq!(directory["data"][0]["profile"]["name"], "Green Valley");
        assert!(directory["data"][0].get("details").is_none());
    }

    #[test]
    fn test_cors_layer_accepts_configured_origins() {
        let config = create_test_config();
        assert!(create_cors_layer(&config).is_ok());

        let mut config = create_test_config();
        config.auth.cors.allowed_origins = vec![CorsOrigin::Wildcard];
        config.auth.cors.allow_credentials = false;
        assert!(create_cors_layer(&config).is_ok());
    }
}
