use std::collections::HashMap;

use crate::entities::{AuthSession, User};

/// Signed-in accounts keyed by the bearer token each login handed back. A caller only
/// ever sees the account behind the token it presents.
#[derive(Clone, Debug, Default)]
pub struct CredentialStore {
    sessions: HashMap<String, AuthSession>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save(&mut self, session: AuthSession) {
        if session.token.is_empty() {
            tracing::warn!("login for {} came back without a token", session.user.email);
            return;
        }

        tracing::info!("signed in as {}", session.user.email);
        self.sessions.insert(session.token.clone(), session);
    }

    /// Signs out the holder of `token`. Unknown tokens are ignored.
    pub fn clear(&mut self, token: &str) {
        if let Some(session) = self.sessions.remove(token) {
            tracing::info!("signed out {}", session.user.email);
        }
    }

    pub fn current_user(&self, token: &str) -> Option<&User> {
        self.sessions.get(token).map(|s| &s.user)
    }

    pub fn is_logged_in(&self, token: &str) -> bool {
        self.sessions.contains_key(token)
    }
}

#[cfg(test)]
fn session(token: &str, email: &str) -> AuthSession {
    AuthSession {
        token: token.into(),
        user: User {
            id: None,
            name: None,
            username: None,
            email: email.into(),
            phone_number: None,
        },
    }
}

#[test]
fn save_and_clear_test() {
    let mut store = CredentialStore::new();
    assert!(!store.is_logged_in("abc"));
    assert!(store.current_user("abc").is_none());

    store.save(session("abc", "nadia@example.com"));

    assert!(store.is_logged_in("abc"));
    assert_eq!(store.current_user("abc").unwrap().email, "nadia@example.com");

    store.clear("abc");
    assert!(!store.is_logged_in("abc"));

    // logging out twice is harmless
    store.clear("abc");
}

#[test]
fn accounts_are_kept_apart_test() {
    let mut store = CredentialStore::new();

    store.save(session("token-a", "nadia@example.com"));
    store.save(session("token-b", "rafi@example.com"));

    assert_eq!(store.current_user("token-a").unwrap().email, "nadia@example.com");
    assert_eq!(store.current_user("token-b").unwrap().email, "rafi@example.com");
    assert!(store.current_user("token-c").is_none());

    store.clear("token-a");
    assert!(store.current_user("token-a").is_none());
    assert_eq!(store.current_user("token-b").unwrap().email, "rafi@example.com");
}

#[test]
fn empty_token_is_not_stored_test() {
    let mut store = CredentialStore::new();

    store.save(session("", "nadia@example.com"));

    assert!(!store.is_logged_in(""));
    assert!(store.current_user("").is_none());
}
