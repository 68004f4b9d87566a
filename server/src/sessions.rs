//! Server-side session records keyed by an opaque token.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::debug;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq)]
pub struct Session {
    pub user_id: i64,
    pub username: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug)]
pub struct SessionStore {
    ttl: chrono::Duration,
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl: chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Starts a session for the user and returns its token. Sessions that
    /// expired without a logout are dropped on the way.
    pub fn create(&self, user_id: i64, username: &str) -> String {
        let token = Uuid::new_v4().simple().to_string();
        let now = Utc::now();
        let session = Session {
            user_id,
            username: username.to_string(),
            created_at: now,
            expires_at: now.checked_add_signed(self.ttl).unwrap_or(DateTime::<Utc>::MAX_UTC),
        };
        let mut sessions = self.write();
        let purged = purge(&mut sessions, now);
        if purged > 0 {
            debug!("purged {purged} expired sessions");
        }
        sessions.insert(token.clone(), session);
        debug!("session opened for user {user_id}");
        token
    }

    /// Looks up a live session. Expired sessions are dropped and reported as
    /// absent.
    pub fn get(&self, token: &str) -> Option<Session> {
        let now = Utc::now();
        match self.read().get(token) {
            Some(session) if !session.is_expired(now) => return Some(session.clone()),
            Some(_) => {}
            None => return None,
        }
        self.write().remove(token);
        None
    }

    /// Returns whether a session was removed.
    pub fn remove(&self, token: &str) -> bool {
        self.write().remove(token).is_some()
    }

    /// Drops every expired session and returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        purge(&mut self.write(), Utc::now())
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Session>> {
        self.sessions.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Session>> {
        self.sessions.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn purge(sessions: &mut HashMap<String, Session>, now: DateTime<Utc>) -> usize {
    let before = sessions.len();
    sessions.retain(|_, session| !session.is_expired(now));
    before - sessions.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_get_remove() {
        let store = SessionStore::new(Duration::from_secs(60));
        let token = store.create(1, "alice");
        let session = store.get(&token).expect("live session");
        assert_eq!(session.username, "alice");
        assert!(store.remove(&token));
        assert!(!store.remove(&token));
        assert!(store.get(&token).is_none());
    }

    #[test]
    fn tokens_are_distinct() {
        let store = SessionStore::new(Duration::from_secs(60));
        let a = store.create(1, "alice");
        let b = store.create(1, "alice");
        assert_ne!(a, b);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn expired_sessions_are_absent_and_purged() {
        let store = SessionStore::new(Duration::ZERO);
        let token = store.create(1, "alice");
        assert!(store.get(&token).is_none());
        assert!(store.is_empty());

        store.create(2, "bob");
        assert_eq!(store.purge_expired(), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn abandoned_sessions_do_not_accumulate() {
        let store = SessionStore::new(Duration::ZERO);
        for user_id in 0..1000 {
            store.create(user_id, "alice");
        }
        // Each create drops what came before it; only the newest remains.
        assert_eq!(store.len(), 1);
        assert_eq!(store.purge_expired(), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn creating_keeps_live_sessions() {
        let store = SessionStore::new(Duration::from_secs(60));
        let first = store.create(1, "alice");
        store.create(2, "bob");
        assert_eq!(store.len(), 2);
        assert!(store.get(&first).is_some());
    }

    #[test]
    fn unknown_token_is_absent() {
        let store = SessionStore::new(Duration::from_secs(60));
        assert!(store.get("not-a-token").is_none());
    }
}
