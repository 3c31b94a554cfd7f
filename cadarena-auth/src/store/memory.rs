use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{
    NewPasswordResetToken, NewUser, NewVerificationToken, PasswordResetToken, User,
    VerificationToken,
};

use super::{AuthStore, StoreError, StoreResult};

/// In-memory [`AuthStore`] used by tests and local development. One lock over
/// the whole state keeps every operation serialized, which is what the port
/// contract requires of read-then-write sequences.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, User>,
    verification_tokens: HashMap<String, VerificationToken>,
    reset_tokens: HashMap<String, PasswordResetToken>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StoreResult<std::sync::MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Backend("store lock poisoned".into()))
    }
}

impl Inner {
    fn user_mut(&mut self, id: Uuid) -> StoreResult<&mut User> {
        self.users
            .get_mut(&id)
            .ok_or_else(|| StoreError::Backend(format!("no user row for id {id}")))
    }
}

#[cfg(test)]
impl MemoryStore {
    pub(crate) fn dump_verification_tokens(&self) -> Vec<VerificationToken> {
        self.inner.lock().unwrap().verification_tokens.values().cloned().collect()
    }

    pub(crate) fn dump_reset_tokens(&self) -> Vec<PasswordResetToken> {
        self.inner.lock().unwrap().reset_tokens.values().cloned().collect()
    }
}

impl AuthStore for MemoryStore {
    fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        let mut inner = self.lock()?;
        if inner.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Duplicate("users.email"));
        }
        if inner.users.values().any(|u| u.username == user.username) {
            return Err(StoreError::Duplicate("users.username"));
        }
        let now = Utc::now();
        let row = User {
            id: Uuid::now_v7(),
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            verified: user.verified,
            refresh_token: None,
            login_attempts: 0,
            locked_until: None,
            created_at: now,
            updated_at: now,
        };
        inner.users.insert(row.id, row.clone());
        Ok(row)
    }

    fn user_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.lock()?.users.get(&id).cloned())
    }

    fn user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self.lock()?.users.values().find(|u| u.email == email).cloned())
    }

    fn user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        Ok(self.lock()?.users.values().find(|u| u.username == username).cloned())
    }

    fn user_by_identifier(&self, identifier: &str) -> StoreResult<Option<User>> {
        Ok(self
            .lock()?
            .users
            .values()
            .find(|u| u.email == identifier || u.username == identifier)
            .cloned())
    }

    fn set_password_hash(&self, id: Uuid, hash: &str) -> StoreResult<()> {
        let mut inner = self.lock()?;
        let user = inner.user_mut(id)?;
        user.password_hash = hash.to_string();
        user.updated_at = Utc::now();
        Ok(())
    }

    fn set_verified(&self, id: Uuid, verified: bool) -> StoreResult<()> {
        let mut inner = self.lock()?;
        let user = inner.user_mut(id)?;
        user.verified = verified;
        user.updated_at = Utc::now();
        Ok(())
    }

    fn set_refresh_token(&self, id: Uuid, token: Option<&str>) -> StoreResult<()> {
        let mut inner = self.lock()?;
        let user = inner.user_mut(id)?;
        user.refresh_token = token.map(str::to_string);
        user.updated_at = Utc::now();
        Ok(())
    }

    fn set_lockout(
        &self,
        id: Uuid,
        login_attempts: i32,
        locked_until: Option<DateTime<Utc>>,
    ) -> StoreResult<()> {
        let mut inner = self.lock()?;
        let user = inner.user_mut(id)?;
        user.login_attempts = login_attempts;
        user.locked_until = locked_until;
        user.updated_at = Utc::now();
        Ok(())
    }

    fn insert_verification_token(&self, token: NewVerificationToken) -> StoreResult<()> {
        let mut inner = self.lock()?;
        if inner.verification_tokens.contains_key(&token.token) {
            return Err(StoreError::Duplicate("verification_tokens.token"));
        }
        inner.verification_tokens.insert(
            token.token.clone(),
            VerificationToken {
                user_id: token.user_id,
                token: token.token,
                expires_at: token.expires_at,
                created_at: Utc::now(),
            },
        );
        Ok(())
    }

    fn delete_verification_tokens_for_user(&self, user_id: Uuid) -> StoreResult<()> {
        self.lock()?
            .verification_tokens
            .retain(|_, row| row.user_id != user_id);
        Ok(())
    }

    fn take_verification_token(&self, token: &str) -> StoreResult<Option<VerificationToken>> {
        Ok(self.lock()?.verification_tokens.remove(token))
    }

    fn insert_reset_token(&self, token: NewPasswordResetToken) -> StoreResult<()> {
        let mut inner = self.lock()?;
        if inner.reset_tokens.contains_key(&token.token) {
            return Err(StoreError::Duplicate("password_reset_tokens.token"));
        }
        inner.reset_tokens.insert(
            token.token.clone(),
            PasswordResetToken {
                user_id: token.user_id,
                token: token.token,
                expires_at: token.expires_at,
                used: false,
                created_at: Utc::now(),
            },
        );
        Ok(())
    }

    fn reset_token(&self, token: &str) -> StoreResult<Option<PasswordResetToken>> {
        Ok(self.lock()?.reset_tokens.get(token).cloned())
    }

    fn claim_reset_token(&self, token: &str) -> StoreResult<bool> {
        let mut inner = self.lock()?;
        match inner.reset_tokens.get_mut(token) {
            Some(row) if !row.used => {
                row.used = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn invalidate_reset_tokens_for_user(&self, user_id: Uuid) -> StoreResult<()> {
        for row in self.lock()?.reset_tokens.values_mut() {
            if row.user_id == user_id && !row.used {
                row.used = true;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(username: &str, email: &str) -> NewUser {
        NewUser {
            username: username.into(),
            email: email.into(),
            password_hash: "$2b$04$stub".into(),
            verified: false,
        }
    }

    #[test]
    fn unique_indexes_are_enforced() {
        let store = MemoryStore::new();
        store.insert_user(new_user("alice", "alice@x.com")).unwrap();

        let err = store.insert_user(new_user("bob", "alice@x.com")).unwrap_err();
        assert!(matches!(err, StoreError::Duplicate("users.email")));

        let err = store.insert_user(new_user("alice", "bob@x.com")).unwrap_err();
        assert!(matches!(err, StoreError::Duplicate("users.username")));
    }

    #[test]
    fn identifier_lookup_matches_email_and_username() {
        let store = MemoryStore::new();
        let user = store.insert_user(new_user("alice", "alice@x.com")).unwrap();

        assert_eq!(store.user_by_identifier("alice").unwrap().unwrap().id, user.id);
        assert_eq!(store.user_by_identifier("alice@x.com").unwrap().unwrap().id, user.id);
        assert!(store.user_by_identifier("carol").unwrap().is_none());
    }

    #[test]
    fn take_verification_token_removes_the_row() {
        let store = MemoryStore::new();
        let user = store.insert_user(new_user("alice", "alice@x.com")).unwrap();
        store
            .insert_verification_token(NewVerificationToken {
                user_id: user.id,
                token: "tok".into(),
                expires_at: Utc::now() + chrono::Duration::hours(1),
            })
            .unwrap();

        assert!(store.take_verification_token("tok").unwrap().is_some());
        assert!(store.take_verification_token("tok").unwrap().is_none());
    }

    #[test]
    fn claim_reset_token_has_one_winner() {
        let store = MemoryStore::new();
        let user = store.insert_user(new_user("alice", "alice@x.com")).unwrap();
        store
            .insert_reset_token(NewPasswordResetToken {
                user_id: user.id,
                token: "tok".into(),
                expires_at: Utc::now() + chrono::Duration::hours(1),
            })
            .unwrap();

        assert!(store.claim_reset_token("tok").unwrap());
        assert!(!store.claim_reset_token("tok").unwrap());
        assert!(!store.claim_reset_token("missing").unwrap());
    }

    #[test]
    fn invalidate_marks_only_unused_rows_of_that_user() {
        let store = MemoryStore::new();
        let alice = store.insert_user(new_user("alice", "alice@x.com")).unwrap();
        let bob = store.insert_user(new_user("bob", "bob@x.com")).unwrap();
        for (user_id, token) in [(alice.id, "a1"), (alice.id, "a2"), (bob.id, "b1")] {
            store
                .insert_reset_token(NewPasswordResetToken {
                    user_id,
                    token: token.into(),
                    expires_at: Utc::now() + chrono::Duration::hours(1),
                })
                .unwrap();
        }

        store.invalidate_reset_tokens_for_user(alice.id).unwrap();

        assert!(store.reset_token("a1").unwrap().unwrap().used);
        assert!(store.reset_token("a2").unwrap().unwrap().used);
        assert!(!store.reset_token("b1").unwrap().unwrap().used);
    }
}
