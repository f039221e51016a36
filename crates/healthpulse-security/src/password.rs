use healthpulse_common::{Error, Result};

/// Hash a password with bcrypt at the default cost.
pub fn hash_password(password: &str) -> Result<String> {
    bcrypt::hash(password, bcrypt::DEFAULT_COST)
        .map_err(|e| Error::Config(format!("failed to hash password: {e}")))
}

/// Check a password against a stored bcrypt hash. A malformed hash counts
/// as a failed check rather than an error surfaced to the caller.
pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}
