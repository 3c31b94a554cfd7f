use cadarena_shared::errors::AppError;

/// bcrypt ignores everything past 72 bytes; input is truncated explicitly so
/// hash and verify agree on the rule. Real-world strength is enforced by
/// [`validate_password_strength`] before anything reaches the hasher.
const MAX_PASSWORD_BYTES: usize = 72;

const SPECIAL_CHARS: &str = "!@#$%^&*(),.?\":{}|<>";

#[derive(Debug, Clone)]
pub struct PasswordHasher {
    cost: u32,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    pub fn hash(&self, password: &str) -> Result<String, AppError> {
        bcrypt::hash(truncate(password), self.cost)
            .map_err(|e| AppError::internal(format!("password hashing failed: {e}")))
    }

    /// `false` on mismatch and on any malformed digest or internal error;
    /// failing to verify is the safe default.
    pub fn verify(&self, password: &str, digest: &str) -> bool {
        bcrypt::verify(truncate(password), digest).unwrap_or(false)
    }
}

fn truncate(password: &str) -> &[u8] {
    let bytes = password.as_bytes();
    &bytes[..bytes.len().min(MAX_PASSWORD_BYTES)]
}

/// Every rule is checked independently and all violations are reported
/// together so callers can show the complete list.
pub fn validate_password_strength(password: &str) -> Result<(), Vec<&'static str>> {
    let mut errors = Vec::new();

    if password.chars().count() < 8 {
        errors.push("password must be at least 8 characters long");
    }
    if password.chars().count() > 72 {
        errors.push("password must be at most 72 characters long");
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        errors.push("password must contain at least one uppercase letter");
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        errors.push("password must contain at least one lowercase letter");
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        errors.push("password must contain at least one digit");
    }
    if !password.chars().any(|c| SPECIAL_CHARS.contains(c)) {
        errors.push("password must contain at least one special character");
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // bcrypt's minimum cost keeps the suite fast; production uses the
    // configured cost (default 12).
    fn hasher() -> PasswordHasher {
        PasswordHasher::new(4)
    }

    #[test]
    fn hash_then_verify_roundtrip() {
        let h = hasher();
        let digest = h.hash("Str0ng!Pass").unwrap();
        assert!(h.verify("Str0ng!Pass", &digest));
        assert!(!h.verify("Wr0ng!Pass", &digest));
    }

    #[test]
    fn hashes_are_salted() {
        let h = hasher();
        let a = h.hash("Str0ng!Pass").unwrap();
        let b = h.hash("Str0ng!Pass").unwrap();
        assert_ne!(a, b);
        assert!(h.verify("Str0ng!Pass", &a));
        assert!(h.verify("Str0ng!Pass", &b));
    }

    #[test]
    fn passwords_sharing_a_72_byte_prefix_verify_identically() {
        let h = hasher();
        let prefix = "A".repeat(70) + "b1";
        let digest = h.hash(&(prefix.clone() + "!extra-one")).unwrap();
        assert!(h.verify(&(prefix.clone() + "!entirely-different-tail"), &digest));
        assert!(h.verify(&prefix, &digest));
    }

    #[test]
    fn verify_returns_false_on_malformed_digest() {
        let h = hasher();
        assert!(!h.verify("Str0ng!Pass", "not-a-bcrypt-digest"));
        assert!(!h.verify("Str0ng!Pass", ""));
        assert!(!h.verify("Str0ng!Pass", "$2b$12$short"));
    }

    #[test]
    fn weak_password_reports_every_violation() {
        let errors = validate_password_strength("short").unwrap_err();
        assert!(errors.iter().any(|e| e.contains("at least 8 characters")));
        assert!(errors.iter().any(|e| e.contains("uppercase")));
        assert!(errors.iter().any(|e| e.contains("digit")));
        assert!(errors.iter().any(|e| e.contains("special character")));
        // lowercase is present in "short", so that rule passes
        assert!(!errors.iter().any(|e| e.contains("lowercase")));
    }

    #[test]
    fn over_length_password_is_rejected_by_policy() {
        let long = format!("Aa1!{}", "x".repeat(80));
        let errors = validate_password_strength(&long).unwrap_err();
        assert_eq!(errors, vec!["password must be at most 72 characters long"]);
    }

    #[test]
    fn strong_password_passes() {
        assert!(validate_password_strength("Str0ng!Pass").is_ok());
    }
}
