use std::env;
use std::path::Path;

use healthpulse_common::{Error, Result};
use tracing::info;

use crate::model::HealthPulseConfig;

/// Loads configuration from a TOML file, then layers environment overrides
/// on top. Missing file means defaults; a malformed file is an error.
pub struct ConfigLoader;

impl ConfigLoader {
    pub fn load(path: &Path) -> Result<HealthPulseConfig> {
        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(path)
                .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;
            let parsed: HealthPulseConfig = toml::from_str(&raw)
                .map_err(|e| Error::Config(format!("failed to parse {}: {e}", path.display())))?;
            info!("loaded configuration from {}", path.display());
            parsed
        } else {
            info!("no config file at {}, using defaults", path.display());
            HealthPulseConfig::default()
        };

        apply_env_overrides(&mut config)?;
        Ok(config)
    }
}

fn apply_env_overrides(config: &mut HealthPulseConfig) -> Result<()> {
    if let Ok(port) = env::var("HEALTHPULSE_PORT") {
        config.gateway.port = port
            .parse()
            .map_err(|_| Error::Config(format!("HEALTHPULSE_PORT is not a port: {port}")))?;
    }
    if let Ok(path) = env::var("HEALTHPULSE_DB") {
        config.database.path = path;
    }
    if let Ok(secret) = env::var("HEALTHPULSE_JWT_SECRET") {
        config.auth.jwt_secret = Some(secret);
    }
    if let Ok(key) = env::var("GEMINI_API_KEY") {
        config.llm.api_key = Some(key);
    }
    Ok(())
}
