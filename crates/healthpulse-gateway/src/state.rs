use std::sync::{Arc, Mutex};

use healthpulse_agents::{ChatPipeline, LlmProvider};
use healthpulse_common::{Error, Result};
use healthpulse_config::HealthPulseConfig;
use healthpulse_db::{ChatStore, HealthStore};

/// Shared application state. Stores and the generation provider are passed
/// in so tests can substitute in-memory stores and a fake provider.
pub struct AppState {
    pub config: HealthPulseConfig,
    pub health: Arc<Mutex<HealthStore>>,
    pub chat: Arc<Mutex<ChatStore>>,
    pub pipeline: ChatPipeline,
    pub jwt_secret: String,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(
        config: HealthPulseConfig,
        health: HealthStore,
        chat: ChatStore,
        provider: Arc<dyn LlmProvider>,
    ) -> Result<Self> {
        let jwt_secret = config.auth.jwt_secret.clone().ok_or_else(|| {
            Error::Config(
                "no JWT secret configured; set HEALTHPULSE_JWT_SECRET or auth.jwt_secret"
                    .to_string(),
            )
        })?;

        let health = Arc::new(Mutex::new(health));
        let chat = Arc::new(Mutex::new(chat));
        let pipeline = ChatPipeline::new(
            Arc::clone(&health),
            Arc::clone(&chat),
            provider,
            config.llm.model.clone(),
        );

        Ok(Self {
            config,
            health,
            chat,
            pipeline,
            jwt_secret,
        })
    }
}
