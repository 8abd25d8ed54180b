//! Server-side sessions.
//!
//! The cookie carries only an opaque random id; everything else lives in the
//! [`SessionStore`]. Sessions expire a fixed time after login with no sliding renewal.

use base64::{Engine as _, engine::general_purpose};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rand::prelude::RngExt;
use rand::rng;
use std::time::Duration;
use tracing::debug;

use crate::config::SessionConfig;
use crate::types::UserId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: String,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

pub struct SessionStore {
    sessions: DashMap<String, Session>,
    timeout: chrono::Duration,
}

impl SessionStore {
    pub fn new(timeout: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            timeout: chrono::Duration::from_std(timeout).unwrap_or(chrono::Duration::hours(24)),
        }
    }

    /// Start a session for `user_id`. Expired sessions of every user are purged on the way.
    pub fn create(&self, user_id: UserId) -> Session {
        self.purge_expired();

        let now = Utc::now();
        let session = Session {
            id: generate_session_id(),
            user_id,
            created_at: now,
            expires_at: now + self.timeout,
        };
        self.sessions.insert(session.id.clone(), session.clone());
        session
    }

    /// Look up a live session. An expired session is removed and reported as absent.
    pub fn resolve(&self, id: &str) -> Option<Session> {
        let session = self.sessions.get(id)?.value().clone();
        if session.is_expired(Utc::now()) {
            self.sessions.remove(id);
            debug!(user_id = session.user_id, "Dropped expired session");
            return None;
        }
        Some(session)
    }

    pub fn destroy(&self, id: &str) -> bool {
        self.sessions.remove(id).is_some()
    }

    /// Destroy every session of a user (suspension, deletion, password change).
    pub fn revoke_user(&self, user_id: UserId) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, s| s.user_id != user_id);
        before.saturating_sub(self.sessions.len())
    }

    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, s| !s.is_expired(now));
        before.saturating_sub(self.sessions.len())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn insert(&self, session: Session) {
        self.sessions.insert(session.id.clone(), session);
    }
}

/// 256 bits of randomness, base64url encoded without padding.
pub fn generate_session_id() -> String {
    let mut bytes = [0u8; 32];
    rng().fill(&mut bytes);
    general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

fn cookie_attributes(config: &SessionConfig, max_age: u64) -> String {
    let same_site = match config.cookie_same_site.to_lowercase().as_str() {
        "lax" => "Lax",
        "none" => "None",
        _ => "Strict",
    };
    let secure = if config.cookie_secure { "; Secure" } else { "" };
    format!("Path=/; HttpOnly{secure}; SameSite={same_site}; Max-Age={max_age}")
}

pub fn create_session_cookie(session_id: &str, config: &SessionConfig) -> String {
    format!(
        "{}={}; {}",
        config.cookie_name,
        session_id,
        cookie_attributes(config, config.timeout.as_secs())
    )
}

/// An already-expired cookie that makes the browser forget the session.
pub fn clear_session_cookie(config: &SessionConfig) -> String {
    format!("{}=; {}", config.cookie_name, cookie_attributes(config, 0))
}

/// Pull the session id out of a `Cookie` header value.
pub fn session_id_from_cookie_header<'a>(header: &'a str, cookie_name: &str) -> Option<&'a str> {
    header
        .split(';')
        .filter_map(|cookie| cookie.trim().split_once('='))
        .find(|(name, value)| *name == cookie_name && !value.is_empty())
        .map(|(_, value)| value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_session_id() {
        let id1 = generate_session_id();
        let id2 = generate_session_id();

        assert_ne!(id1, id2);
        // 32 bytes -> 43 base64url chars
        assert_eq!(id1.len(), 43);
        assert!(id1.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_create_and_resolve() {
        let store = SessionStore::new(Duration::from_secs(3600));
        let session = store.create(7);

        let resolved = store.resolve(&session.id).unwrap();
        assert_eq!(resolved.user_id, 7);
        assert_eq!(resolved.expires_at - resolved.created_at, chrono::Duration::hours(1));
        assert!(store.resolve("unknown").is_none());
    }

    #[test]
    fn test_expired_session_does_not_resolve() {
        let store = SessionStore::new(Duration::from_secs(3600));
        let now = Utc::now();
        store.insert(Session {
            id: "stale".to_string(),
            user_id: 7,
            created_at: now - chrono::Duration::hours(25),
            expires_at: now - chrono::Duration::hours(1),
        });

        assert!(store.resolve("stale").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_revoke_user_and_destroy() {
        let store = SessionStore::new(Duration::from_secs(3600));
        let a = store.create(1);
        store.create(1);
        let b = store.create(2);

        assert_eq!(store.revoke_user(1), 2);
        assert!(store.resolve(&a.id).is_none());
        assert!(store.resolve(&b.id).is_some());

        assert!(store.destroy(&b.id));
        assert!(!store.destroy(&b.id));
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_session_cookie_attributes() {
        let mut config = SessionConfig::default();
        let cookie = create_session_cookie("abc", &config);
        assert_eq!(cookie, "ngo_session=abc; Path=/; HttpOnly; Secure; SameSite=Strict; Max-Age=86400");

        config.cookie_secure = false;
        config.cookie_same_site = "lax".to_string();
        let cleared = clear_session_cookie(&config);
        assert_eq!(cleared, "ngo_session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    }

    #[test]
    fn test_session_id_from_cookie_header() {
        let header = "theme=dark; ngo_session=abc123; other=x";
        assert_eq!(session_id_from_cookie_header(header, "ngo_session"), Some("abc123"));
        assert_eq!(session_id_from_cookie_header("ngo_session=", "ngo_session"), None);
        assert_eq!(session_id_from_cookie_header("theme=dark", "ngo_session"), None);
    }
}
