use std::sync::Arc;

use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use cadarena_shared::clients::email::EmailClient;
use cadarena_shared::errors::{AppError, AppResult, ErrorCode};
use cadarena_shared::types::auth::TokenPair;

use crate::config::AuthConfig;
use crate::models::{NewUser, User};
use crate::services::ephemeral::{ResetTokens, VerificationTokens};
use crate::services::lockout::{LockStatus, LockoutPolicy, LockoutState};
use crate::services::password::{validate_password_strength, PasswordHasher};
use crate::services::token_service::TokenService;
use crate::store::AuthStore;

/// Generic responses for the flows that must not leak account existence.
/// Every branch of those flows returns the identical constant.
pub const VERIFICATION_SENT_MESSAGE: &str = "if the email exists, a verification link has been sent";
pub const RESET_REQUESTED_MESSAGE: &str = "if the email exists, a password reset link has been sent";

#[derive(Debug, Deserialize, Validate)]
pub struct SignupRequest {
    #[validate(length(min = 3, max = 32, message = "username must be 3-32 characters"))]
    pub username: String,
    #[validate(email(message = "invalid email format"))]
    pub email: String,
    pub password: String,
}

/// Orchestrates every credential-lifecycle flow. Constructed once at process
/// start and shared by reference; all state lives in the storage port.
pub struct AuthService {
    store: Arc<dyn AuthStore>,
    email: EmailClient,
    hasher: PasswordHasher,
    tokens: TokenService,
    lockout: LockoutPolicy,
    verification_tokens: VerificationTokens,
    reset_tokens: ResetTokens,
    email_enabled: bool,
}

impl AuthService {
    pub fn new(config: &AuthConfig, store: Arc<dyn AuthStore>, email: EmailClient) -> Self {
        Self {
            email,
            hasher: PasswordHasher::new(config.bcrypt_cost),
            tokens: TokenService::new(config),
            lockout: LockoutPolicy::new(config.max_login_attempts, config.lockout_duration_minutes),
            verification_tokens: VerificationTokens::new(store.clone(), config.verification_ttl_hours),
            reset_tokens: ResetTokens::new(store.clone(), config.reset_ttl_hours),
            email_enabled: config.email_enabled,
            store,
        }
    }

    // ---- Registration ----

    pub async fn signup(&self, req: SignupRequest) -> AppResult<User> {
        req.validate()
            .map_err(|e| AppError::new(ErrorCode::ValidationError, e.to_string()))?;
        check_password_strength(&req.password)?;

        let username = req.username.trim().to_lowercase();
        let email = req.email.trim().to_lowercase();

        if self.store.user_by_email(&email)?.is_some() {
            return Err(AppError::new(ErrorCode::EmailAlreadyExists, "email already registered"));
        }
        if self.store.user_by_username(&username)?.is_some() {
            return Err(AppError::new(ErrorCode::UsernameTaken, "username already taken"));
        }

        let password_hash = self.hash_password(req.password).await?;

        // Without outbound email there is no way to complete verification,
        // so accounts are verified on creation.
        let user = self.store.insert_user(NewUser {
            username,
            email,
            password_hash,
            verified: !self.email_enabled,
        })?;

        if self.email_enabled {
            let token = self.verification_tokens.issue(user.id)?;
            self.dispatch_verification_email(&user, token);
        }

        tracing::info!(user_id = %user.id, "user registered");
        Ok(user)
    }

    // ---- Login ----

    pub async fn login(&self, identifier: &str, password: &str) -> AppResult<TokenPair> {
        let identifier = identifier.trim().to_lowercase();

        // Unknown identifier and wrong password fail identically.
        let Some(user) = self.store.user_by_identifier(&identifier)? else {
            return Err(invalid_credentials());
        };

        if let LockStatus::Locked { remaining_minutes } =
            self.lockout.check(lockout_state(&user), chrono::Utc::now())
        {
            return Err(AppError::with_details(
                ErrorCode::AccountLocked,
                format!(
                    "account locked due to too many failed login attempts, try again in {remaining_minutes} minutes"
                ),
                serde_json::json!({ "remaining_minutes": remaining_minutes }),
            ));
        }

        if !self.verify_password(password.to_string(), user.password_hash.clone()).await? {
            let state = self.lockout.on_failure(lockout_state(&user), chrono::Utc::now());
            self.store.set_lockout(user.id, state.login_attempts, state.locked_until)?;
            tracing::warn!(user_id = %user.id, attempts = state.login_attempts, "failed login attempt");
            return Err(invalid_credentials());
        }

        if self.email_enabled && !user.verified {
            return Err(AppError::new(
                ErrorCode::EmailNotVerified,
                "email not verified, please check your email for the verification link",
            ));
        }
        if !self.email_enabled && !user.verified {
            self.store.set_verified(user.id, true)?;
        }

        let state = self.lockout.on_success(lockout_state(&user));
        self.store.set_lockout(user.id, state.login_attempts, state.locked_until)?;

        let pair = self.tokens.issue_pair(user.id, &user.username)?;
        self.store.set_refresh_token(user.id, Some(&pair.refresh_token))?;

        tracing::info!(user_id = %user.id, "user logged in");
        Ok(pair)
    }

    // ---- Token refresh ----

    pub async fn refresh(&self, refresh_token: &str) -> AppResult<TokenPair> {
        let claims = self
            .tokens
            .decode_refresh(refresh_token)
            .map_err(|_| invalid_refresh_token())?;

        let user = self.store.user_by_id(claims.sub)?.ok_or_else(invalid_refresh_token)?;

        // Only the stored token is live; a superseded token is rejected even
        // though its signature still verifies.
        if user.refresh_token.as_deref() != Some(refresh_token) {
            return Err(invalid_refresh_token());
        }

        let pair = self.tokens.issue_pair(user.id, &user.username)?;
        self.store.set_refresh_token(user.id, Some(&pair.refresh_token))?;

        tracing::debug!(user_id = %user.id, "refresh token rotated");
        Ok(pair)
    }

    // ---- Email verification ----

    pub async fn verify_email(&self, token: &str) -> AppResult<&'static str> {
        let user_id = self.verification_tokens.consume(token)?;
        let user = self
            .store
            .user_by_id(user_id)?
            .ok_or_else(|| AppError::not_found("user not found"))?;

        if user.verified {
            return Ok("email already verified");
        }

        self.store.set_verified(user.id, true)?;
        tracing::info!(user_id = %user.id, "email verified");
        Ok("email verified successfully")
    }

    pub async fn resend_verification(&self, email: &str) -> AppResult<&'static str> {
        let email = email.trim().to_lowercase();

        if let Some(user) = self.store.user_by_email(&email)? {
            if !user.verified {
                let token = self.verification_tokens.issue(user.id)?;
                self.dispatch_verification_email(&user, token);
                tracing::debug!(user_id = %user.id, "verification email reissued");
            }
        }

        // Identical response whether the account exists or not.
        Ok(VERIFICATION_SENT_MESSAGE)
    }

    // ---- Password reset ----

    pub async fn forgot_password(&self, email: &str) -> AppResult<&'static str> {
        let email = email.trim().to_lowercase();

        if let Some(user) = self.store.user_by_email(&email)? {
            let token = self.reset_tokens.issue(user.id)?;
            self.dispatch_reset_email(&user, token);
            tracing::debug!(user_id = %user.id, "password reset issued");
        }

        Ok(RESET_REQUESTED_MESSAGE)
    }

    pub async fn reset_password(&self, token: &str, new_password: &str) -> AppResult<&'static str> {
        // Strength errors are reported before the token is spent.
        check_password_strength(new_password)?;

        let user_id = self.reset_tokens.consume(token)?;
        let user = self
            .store
            .user_by_id(user_id)?
            .ok_or_else(|| AppError::not_found("user not found"))?;

        let hash = self.hash_password(new_password.to_string()).await?;
        self.store.set_password_hash(user.id, &hash)?;

        // A reset proves mailbox control; it always lifts a lockout and
        // revokes the live refresh session.
        let state = self.lockout.on_success(lockout_state(&user));
        self.store.set_lockout(user.id, state.login_attempts, state.locked_until)?;
        self.store.set_refresh_token(user.id, None)?;

        tracing::info!(user_id = %user.id, "password reset");
        Ok("password reset successfully")
    }

    pub async fn change_password(
        &self,
        user_id: Uuid,
        current_password: &str,
        new_password: &str,
    ) -> AppResult<&'static str> {
        let user = self
            .store
            .user_by_id(user_id)?
            .ok_or_else(|| AppError::not_found("user not found"))?;

        if !self
            .verify_password(current_password.to_string(), user.password_hash.clone())
            .await?
        {
            return Err(AppError::unauthorized("current password is incorrect"));
        }

        check_password_strength(new_password)?;

        let hash = self.hash_password(new_password.to_string()).await?;
        self.store.set_password_hash(user.id, &hash)?;

        tracing::info!(user_id = %user.id, "password changed");
        Ok("password changed successfully")
    }

    // ---- Sessions ----

    pub async fn logout(&self, user_id: Uuid) -> AppResult<()> {
        self.store.set_refresh_token(user_id, None)?;
        tracing::info!(user_id = %user_id, "user logged out");
        Ok(())
    }

    pub async fn current_user(&self, access_token: &str) -> AppResult<User> {
        let claims = self
            .tokens
            .decode_access(access_token)
            .map_err(|_| AppError::unauthorized("invalid or expired token"))?;

        self.store
            .user_by_id(claims.sub)?
            .ok_or_else(|| AppError::unauthorized("user not found"))
    }

    /// The gate for every protected, non-auth endpoint.
    pub async fn current_verified_user(&self, access_token: &str) -> AppResult<User> {
        let user = self.current_user(access_token).await?;
        if !user.verified {
            return Err(AppError::forbidden(
                "email not verified, please verify your email address",
            ));
        }
        Ok(user)
    }

    // ---- Helpers ----

    async fn hash_password(&self, password: String) -> AppResult<String> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| AppError::internal(format!("hashing task failed: {e}")))?
    }

    async fn verify_password(&self, password: String, digest: String) -> AppResult<bool> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &digest))
            .await
            .map_err(|e| AppError::internal(format!("hashing task failed: {e}")))
    }

    fn dispatch_verification_email(&self, user: &User, token: String) {
        let email = self.email.clone();
        let to = user.email.clone();
        let username = user.username.clone();
        tokio::spawn(async move {
            if let Err(e) = email.send_verification_email(&to, &username, &token).await {
                tracing::error!(error = %e, "failed to send verification email");
            }
        });
    }

    fn dispatch_reset_email(&self, user: &User, token: String) {
        let email = self.email.clone();
        let to = user.email.clone();
        let username = user.username.clone();
        tokio::spawn(async move {
            if let Err(e) = email.send_password_reset_email(&to, &username, &token).await {
                tracing::error!(error = %e, "failed to send reset email");
            }
        });
    }
}

fn lockout_state(user: &User) -> LockoutState {
    LockoutState {
        login_attempts: user.login_attempts,
        locked_until: user.locked_until,
    }
}

fn invalid_credentials() -> AppError {
    AppError::new(ErrorCode::InvalidCredentials, "incorrect email/username or password")
}

fn invalid_refresh_token() -> AppError {
    AppError::new(ErrorCode::TokenInvalid, "invalid or expired refresh token")
}

fn check_password_strength(password: &str) -> AppResult<()> {
    validate_password_strength(password).map_err(|errors| {
        AppError::with_details(
            ErrorCode::PasswordTooWeak,
            "password does not meet requirements",
            serde_json::json!({ "errors": errors }),
        )
    })
}
