use std::sync::Arc;

use chrono::{Duration, Utc};
use rand::Rng;
use uuid::Uuid;

use cadarena_shared::errors::{AppError, ErrorCode};

use crate::models::{NewPasswordResetToken, NewVerificationToken};
use crate::store::AuthStore;

/// 32 bytes of entropy, hex-encoded so the token survives a URL untouched.
fn generate_opaque_token() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    hex::encode(bytes)
}

/// Single-use, expiring email-verification tokens. Issuing replaces any
/// outstanding token for the user; consuming removes the row.
pub struct VerificationTokens {
    store: Arc<dyn AuthStore>,
    ttl: Duration,
}

impl VerificationTokens {
    pub fn new(store: Arc<dyn AuthStore>, ttl_hours: i64) -> Self {
        Self { store, ttl: Duration::hours(ttl_hours) }
    }

    pub fn issue(&self, user_id: Uuid) -> Result<String, AppError> {
        self.store.delete_verification_tokens_for_user(user_id)?;
        let token = generate_opaque_token();
        self.store.insert_verification_token(NewVerificationToken {
            user_id,
            token: token.clone(),
            expires_at: Utc::now() + self.ttl,
        })?;
        Ok(token)
    }

    pub fn consume(&self, token: &str) -> Result<Uuid, AppError> {
        let row = self
            .store
            .take_verification_token(token)?
            .ok_or_else(|| AppError::new(ErrorCode::TokenNotFound, "invalid verification token"))?;

        if row.expires_at < Utc::now() {
            return Err(AppError::new(
                ErrorCode::TokenExpired,
                "verification token has expired",
            ));
        }

        Ok(row.user_id)
    }
}

/// Single-use, expiring password-reset tokens. Issuing marks every prior
/// unused token for the user used; consuming is a compare-and-set on the
/// used flag, so concurrent calls for the same token have one winner.
pub struct ResetTokens {
    store: Arc<dyn AuthStore>,
    ttl: Duration,
}

impl ResetTokens {
    pub fn new(store: Arc<dyn AuthStore>, ttl_hours: i64) -> Self {
        Self { store, ttl: Duration::hours(ttl_hours) }
    }

    pub fn issue(&self, user_id: Uuid) -> Result<String, AppError> {
        self.store.invalidate_reset_tokens_for_user(user_id)?;
        let token = generate_opaque_token();
        self.store.insert_reset_token(NewPasswordResetToken {
            user_id,
            token: token.clone(),
            expires_at: Utc::now() + self.ttl,
        })?;
        Ok(token)
    }

    pub fn consume(&self, token: &str) -> Result<Uuid, AppError> {
        let row = self
            .store
            .reset_token(token)?
            .ok_or_else(|| AppError::new(ErrorCode::TokenNotFound, "invalid reset token"))?;

        if row.used {
            return Err(AppError::new(
                ErrorCode::TokenAlreadyUsed,
                "reset token has already been used",
            ));
        }
        if row.expires_at < Utc::now() {
            return Err(AppError::new(ErrorCode::TokenExpired, "reset token has expired"));
        }

        if !self.store.claim_reset_token(token)? {
            // lost the race to a concurrent consumer
            return Err(AppError::new(
                ErrorCode::TokenAlreadyUsed,
                "reset token has already been used",
            ));
        }

        Ok(row.user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewUser;
    use crate::store::MemoryStore;

    fn store_with_user() -> (Arc<MemoryStore>, Uuid) {
        let store = Arc::new(MemoryStore::new());
        let user = store
            .insert_user(NewUser {
                username: "alice".into(),
                email: "alice@x.com".into(),
                password_hash: "$2b$04$stub".into(),
                verified: false,
            })
            .unwrap();
        (store, user.id)
    }

    #[test]
    fn verification_issue_consume_roundtrip() {
        let (store, user_id) = store_with_user();
        let tokens = VerificationTokens::new(store, 24);

        let token = tokens.issue(user_id).unwrap();
        assert!(token.len() >= 64);
        assert_eq!(tokens.consume(&token).unwrap(), user_id);

        // consumed rows are gone
        let err = tokens.consume(&token).unwrap_err();
        assert_eq!(err.code(), ErrorCode::TokenNotFound);
    }

    #[test]
    fn verification_reissue_invalidates_prior_token() {
        let (store, user_id) = store_with_user();
        let tokens = VerificationTokens::new(store, 24);

        let first = tokens.issue(user_id).unwrap();
        let second = tokens.issue(user_id).unwrap();

        assert_eq!(tokens.consume(&first).unwrap_err().code(), ErrorCode::TokenNotFound);
        assert_eq!(tokens.consume(&second).unwrap(), user_id);
    }

    #[test]
    fn expired_verification_token_is_rejected() {
        let (store, user_id) = store_with_user();
        let tokens = VerificationTokens::new(store, -1);

        let token = tokens.issue(user_id).unwrap();
        assert_eq!(tokens.consume(&token).unwrap_err().code(), ErrorCode::TokenExpired);
    }

    #[test]
    fn reset_token_is_single_use() {
        let (store, user_id) = store_with_user();
        let tokens = ResetTokens::new(store, 1);

        let token = tokens.issue(user_id).unwrap();
        assert_eq!(tokens.consume(&token).unwrap(), user_id);
        assert_eq!(tokens.consume(&token).unwrap_err().code(), ErrorCode::TokenAlreadyUsed);
    }

    #[test]
    fn reset_reissue_marks_prior_tokens_used() {
        let (store, user_id) = store_with_user();
        let tokens = ResetTokens::new(store, 1);

        let first = tokens.issue(user_id).unwrap();
        let second = tokens.issue(user_id).unwrap();

        assert_eq!(tokens.consume(&first).unwrap_err().code(), ErrorCode::TokenAlreadyUsed);
        assert_eq!(tokens.consume(&second).unwrap(), user_id);
    }

    #[test]
    fn unknown_and_expired_reset_tokens_are_distinct_errors() {
        let (store, user_id) = store_with_user();

        let missing = ResetTokens::new(store.clone(), 1);
        assert_eq!(missing.consume("deadbeef").unwrap_err().code(), ErrorCode::TokenNotFound);

        let expired = ResetTokens::new(store, -1);
        let token = expired.issue(user_id).unwrap();
        assert_eq!(expired.consume(&token).unwrap_err().code(), ErrorCode::TokenExpired);
    }
}
