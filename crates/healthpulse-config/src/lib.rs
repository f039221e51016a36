pub mod loader;
pub mod model;

pub use loader::ConfigLoader;
pub use model::{
    AuthConfig, DatabaseConfig, GatewayConfig, HealthPulseConfig, LlmConfig, RateLimitConfig,
};
