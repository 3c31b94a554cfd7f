use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use cadarena_shared::errors::{AppError, ErrorCode};
use cadarena_shared::types::auth::{Claims, TokenKind, TokenPair};

use crate::config::AuthConfig;

/// How decode failures are handled.
///
/// `Strict` accepts only tokens whose signature and expiry verify against
/// this service's secret. `Lenient` reproduces the demo-environment
/// tolerance: when verification fails the claims are read without checking
/// the signature (or expiry), and only the embedded type tag is still
/// enforced. Lenient mode drops the guarantee that an accepted token was
/// issued by this service; it exists for local setups with mismatched keys
/// and must never be enabled in production.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeMode {
    Strict,
    Lenient,
}

impl std::str::FromStr for DecodeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "strict" => Ok(DecodeMode::Strict),
            "lenient" => Ok(DecodeMode::Lenient),
            _ => Err(format!("unknown decode mode: {s}")),
        }
    }
}

/// Issues and validates the two bearer-token kinds. Each kind has its own
/// signing secret, so a leaked refresh secret cannot forge access tokens and
/// vice versa. Pure computation over (claims, secret, clock); safe to share.
#[derive(Clone)]
pub struct TokenService {
    access_secret: String,
    refresh_secret: String,
    access_ttl_secs: i64,
    refresh_ttl_secs: i64,
    mode: DecodeMode,
}

impl TokenService {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            access_secret: config.access_secret.clone(),
            refresh_secret: config.refresh_secret.clone(),
            access_ttl_secs: config.access_ttl_minutes * 60,
            refresh_ttl_secs: config.refresh_ttl_days * 24 * 3600,
            mode: config.decode_mode(),
        }
    }

    pub fn issue_access(&self, user_id: Uuid, username: &str) -> Result<String, AppError> {
        let claims = Claims::new_access(user_id, username, self.access_ttl_secs);
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.access_secret.as_bytes()),
        )
        .map_err(|e| AppError::internal(format!("JWT encoding failed: {e}")))
    }

    pub fn issue_refresh(&self, user_id: Uuid) -> Result<String, AppError> {
        let claims = Claims::new_refresh(user_id, self.refresh_ttl_secs);
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.refresh_secret.as_bytes()),
        )
        .map_err(|e| AppError::internal(format!("JWT encoding failed: {e}")))
    }

    pub fn issue_pair(&self, user_id: Uuid, username: &str) -> Result<TokenPair, AppError> {
        let access_token = self.issue_access(user_id, username)?;
        let refresh_token = self.issue_refresh(user_id)?;
        Ok(TokenPair::new(access_token, refresh_token, self.access_ttl_secs))
    }

    pub fn decode_access(&self, token: &str) -> Result<Claims, AppError> {
        self.decode_kind(token, TokenKind::Access, &self.access_secret)
    }

    pub fn decode_refresh(&self, token: &str) -> Result<Claims, AppError> {
        self.decode_kind(token, TokenKind::Refresh, &self.refresh_secret)
    }

    fn decode_kind(&self, token: &str, kind: TokenKind, secret: &str) -> Result<Claims, AppError> {
        let mut validation = Validation::default();
        validation.leeway = 0;

        let verified = decode::<Claims>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &validation,
        );

        let claims = match verified {
            Ok(data) => data.claims,
            Err(_) if self.mode == DecodeMode::Lenient => decode_unverified(token)?,
            Err(_) => {
                return Err(AppError::new(
                    ErrorCode::TokenInvalid,
                    "invalid or expired token",
                ))
            }
        };

        if claims.kind != kind {
            return Err(AppError::new(
                ErrorCode::TokenInvalid,
                format!("wrong token type, expected {kind}"),
            ));
        }

        Ok(claims)
    }
}

fn decode_unverified(token: &str) -> Result<Claims, AppError> {
    let mut insecure = Validation::default();
    insecure.insecure_disable_signature_validation();
    insecure.validate_exp = false;
    insecure.required_spec_claims.clear();

    decode::<Claims>(token, &DecodingKey::from_secret(&[]), &insecure)
        .map(|data| data.claims)
        .map_err(|_| AppError::new(ErrorCode::TokenInvalid, "invalid or expired token"))
}
