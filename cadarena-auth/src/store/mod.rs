use chrono::{DateTime, Utc};
use uuid::Uuid;

use cadarena_shared::AppError;

use crate::models::{
    NewPasswordResetToken, NewUser, NewVerificationToken, PasswordResetToken, User,
    VerificationToken,
};

mod memory;

pub use memory::MemoryStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("duplicate key: {0}")]
    Duplicate(&'static str),
    #[error("storage backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Internal(anyhow::Error::new(err))
    }
}

/// Port to the relational storage collaborator. Implementations must be safe
/// to share across request tasks; every method is a single storage round trip
/// and the token take/claim operations are atomic with respect to concurrent
/// callers (at most one caller wins a given token).
pub trait AuthStore: Send + Sync {
    // users
    fn insert_user(&self, user: NewUser) -> StoreResult<User>;
    fn user_by_id(&self, id: Uuid) -> StoreResult<Option<User>>;
    fn user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    fn user_by_username(&self, username: &str) -> StoreResult<Option<User>>;
    /// Lookup matching either the email or the username unique index.
    fn user_by_identifier(&self, identifier: &str) -> StoreResult<Option<User>>;
    fn set_password_hash(&self, id: Uuid, hash: &str) -> StoreResult<()>;
    fn set_verified(&self, id: Uuid, verified: bool) -> StoreResult<()>;
    fn set_refresh_token(&self, id: Uuid, token: Option<&str>) -> StoreResult<()>;
    fn set_lockout(
        &self,
        id: Uuid,
        login_attempts: i32,
        locked_until: Option<DateTime<Utc>>,
    ) -> StoreResult<()>;

    // email verification tokens
    fn insert_verification_token(&self, token: NewVerificationToken) -> StoreResult<()>;
    fn delete_verification_tokens_for_user(&self, user_id: Uuid) -> StoreResult<()>;
    /// Atomically remove and return the row for `token`, when present.
    fn take_verification_token(&self, token: &str) -> StoreResult<Option<VerificationToken>>;

    // password reset tokens
    fn insert_reset_token(&self, token: NewPasswordResetToken) -> StoreResult<()>;
    fn reset_token(&self, token: &str) -> StoreResult<Option<PasswordResetToken>>;
    /// Compare-and-set `used` false -> true. Returns `false` when the row is
    /// absent or was already used, so concurrent consumers get one winner.
    fn claim_reset_token(&self, token: &str) -> StoreResult<bool>;
    /// Filtered bulk-update: mark every unused reset token of `user_id` used.
    fn invalidate_reset_tokens_for_user(&self, user_id: Uuid) -> StoreResult<()>;
}
