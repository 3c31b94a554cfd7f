use serde::Deserialize;

use cadarena_shared::clients::email::{EmailClient, EmailProvider};

use crate::services::token_service::DecodeMode;

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    #[serde(default = "default_access_secret")]
    pub access_secret: String,
    #[serde(default = "default_refresh_secret")]
    pub refresh_secret: String,
    #[serde(default = "default_access_ttl")]
    pub access_ttl_minutes: i64,
    #[serde(default = "default_refresh_ttl")]
    pub refresh_ttl_days: i64,
    #[serde(default = "default_max_login_attempts")]
    pub max_login_attempts: u32,
    #[serde(default = "default_lockout_duration")]
    pub lockout_duration_minutes: i64,
    #[serde(default = "default_verification_ttl")]
    pub verification_ttl_hours: i64,
    #[serde(default = "default_reset_ttl")]
    pub reset_ttl_hours: i64,
    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,
    #[serde(default)]
    pub email_enabled: bool,
    #[serde(default = "default_email_provider")]
    pub email_provider: String,
    #[serde(default = "default_resend_api_key")]
    pub resend_api_key: String,
    #[serde(default = "default_from_email")]
    pub from_email: String,
    #[serde(default = "default_from_name")]
    pub from_name: String,
    #[serde(default = "default_frontend_url")]
    pub frontend_url: String,
    #[serde(default = "default_token_decode_mode")]
    pub token_decode_mode: String,
}

fn default_access_secret() -> String { "development-access-secret-change-in-production".into() }
fn default_refresh_secret() -> String { "development-refresh-secret-change-in-production".into() }
fn default_access_ttl() -> i64 { 30 }
fn default_refresh_ttl() -> i64 { 7 }
fn default_max_login_attempts() -> u32 { 5 }
fn default_lockout_duration() -> i64 { 15 }
fn default_verification_ttl() -> i64 { 24 }
fn default_reset_ttl() -> i64 { 1 }
fn default_bcrypt_cost() -> u32 { 12 }
fn default_email_provider() -> String { "console".into() }
fn default_resend_api_key() -> String { String::new() }
fn default_from_email() -> String { "noreply@cadarena.com".into() }
fn default_from_name() -> String { "CadArena".into() }
fn default_frontend_url() -> String { "http://localhost:3000".into() }
fn default_token_decode_mode() -> String { "strict".into() }

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            access_secret: default_access_secret(),
            refresh_secret: default_refresh_secret(),
            access_ttl_minutes: default_access_ttl(),
            refresh_ttl_days: default_refresh_ttl(),
            max_login_attempts: default_max_login_attempts(),
            lockout_duration_minutes: default_lockout_duration(),
            verification_ttl_hours: default_verification_ttl(),
            reset_ttl_hours: default_reset_ttl(),
            bcrypt_cost: default_bcrypt_cost(),
            email_enabled: false,
            email_provider: default_email_provider(),
            resend_api_key: default_resend_api_key(),
            from_email: default_from_email(),
            from_name: default_from_name(),
            frontend_url: default_frontend_url(),
            token_decode_mode: default_token_decode_mode(),
        }
    }
}

impl AuthConfig {
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("CADARENA_AUTH").separator("__"))
            .build()?;
        Ok(config.try_deserialize().unwrap_or_default())
    }

    /// Provider string parsed into the closed enum; anything unrecognized
    /// falls back to `Console`, as does a disabled email switch.
    pub fn email_client(&self) -> EmailClient {
        let provider = if self.email_enabled {
            self.email_provider.parse().unwrap_or(EmailProvider::Console)
        } else {
            EmailProvider::Console
        };
        EmailClient::new(
            provider,
            &self.resend_api_key,
            &self.from_email,
            &self.from_name,
            &self.frontend_url,
        )
    }

    /// Decode mode parsed from configuration; unrecognized values fall back
    /// to `Strict`, the safe direction.
    pub fn decode_mode(&self) -> DecodeMode {
        self.token_decode_mode.parse().unwrap_or(DecodeMode::Strict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_security_settings() {
        let config = AuthConfig::default();
        assert_eq!(config.access_ttl_minutes, 30);
        assert_eq!(config.refresh_ttl_days, 7);
        assert_eq!(config.max_login_attempts, 5);
        assert_eq!(config.lockout_duration_minutes, 15);
        assert_eq!(config.verification_ttl_hours, 24);
        assert_eq!(config.reset_ttl_hours, 1);
        assert_eq!(config.bcrypt_cost, 12);
        assert!(!config.email_enabled);
        assert_eq!(config.decode_mode(), DecodeMode::Strict);
    }

    #[test]
    fn unknown_decode_mode_falls_back_to_strict() {
        let config = AuthConfig {
            token_decode_mode: "permissive".into(),
            ..AuthConfig::default()
        };
        assert_eq!(config.decode_mode(), DecodeMode::Strict);
    }
}
