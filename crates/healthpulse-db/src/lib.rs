pub mod chat_store;
pub mod health_store;

pub use chat_store::ChatStore;
pub use health_store::HealthStore;

use tracing::warn;

pub(crate) fn parse_timestamp(value: &str) -> chrono::DateTime<chrono::Utc> {
    chrono::DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .unwrap_or_else(|e| {
            warn!(
                "failed to parse timestamp '{}': {e}, falling back to now",
                value
            );
            chrono::Utc::now()
        })
}
