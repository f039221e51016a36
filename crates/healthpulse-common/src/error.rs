use thiserror::Error;

/// Failure taxonomy shared by every HealthPulse crate.
///
/// `RateLimited`, `Timeout` and `Provider` are kept distinct so the gateway
/// can pass provider backpressure through verbatim while collapsing every
/// other upstream failure into one generic outcome.
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("provider rate limited: {0}")]
    RateLimited(String),

    #[error("provider deadline exceeded: {0}")]
    Timeout(String),

    #[error("provider error: {0}")]
    Provider(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::Error;

    #[test]
    fn display_includes_detail() {
        let err = Error::Database("no such table: users".to_string());
        assert_eq!(err.to_string(), "database error: no such table: users");
    }

    #[test]
    fn rate_limit_is_distinct_from_timeout() {
        let rate = Error::RateLimited("status=429".to_string());
        let slow = Error::Timeout("no response within 30s".to_string());
        assert!(matches!(rate, Error::RateLimited(_)));
        assert!(matches!(slow, Error::Timeout(_)));
        assert_ne!(rate.to_string(), slow.to_string());
    }
}
