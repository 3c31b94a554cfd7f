use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The two disjoint bearer-token categories. A token of one kind is never
/// accepted where the other is expected, even when its signature checks out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenKind::Access => write!(f, "access"),
            TokenKind::Refresh => write!(f, "refresh"),
        }
    }
}

impl std::str::FromStr for TokenKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "access" => Ok(TokenKind::Access),
            "refresh" => Ok(TokenKind::Refresh),
            _ => Err(format!("unknown token kind: {s}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(rename = "type")]
    pub kind: TokenKind,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn new_access(user_id: Uuid, username: impl Into<String>, duration_secs: i64) -> Self {
        let now = Utc::now().timestamp();
        Self {
            sub: user_id,
            username: Some(username.into()),
            kind: TokenKind::Access,
            iat: now,
            exp: now + duration_secs,
        }
    }

    pub fn new_refresh(user_id: Uuid, duration_secs: i64) -> Self {
        let now = Utc::now().timestamp();
        Self {
            sub: user_id,
            username: None,
            kind: TokenKind::Refresh,
            iat: now,
            exp: now + duration_secs,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() > self.exp
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

impl TokenPair {
    pub fn new(access_token: String, refresh_token: String, expires_in: i64) -> Self {
        Self {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_kind_roundtrip() {
        assert_eq!("access".parse::<TokenKind>().unwrap(), TokenKind::Access);
        assert_eq!("refresh".parse::<TokenKind>().unwrap(), TokenKind::Refresh);
        assert_eq!(TokenKind::Access.to_string(), "access");
        assert!("session".parse::<TokenKind>().is_err());
    }

    #[test]
    fn access_claims_carry_username() {
        let id = Uuid::now_v7();
        let claims = Claims::new_access(id, "alice", 1800);
        assert_eq!(claims.sub, id);
        assert_eq!(claims.username.as_deref(), Some("alice"));
        assert_eq!(claims.kind, TokenKind::Access);
        assert_eq!(claims.exp - claims.iat, 1800);
        assert!(!claims.is_expired());
    }

    #[test]
    fn refresh_claims_have_no_username_on_the_wire() {
        let claims = Claims::new_refresh(Uuid::now_v7(), 60);
        let json = serde_json::to_value(&claims).unwrap();
        assert!(json.get("username").is_none());
        assert_eq!(json["type"], "refresh");
    }
}
