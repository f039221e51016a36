use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use healthpulse_agents::{GeminiProvider, LlmProvider};
use healthpulse_common::{Error, Result};
use healthpulse_config::HealthPulseConfig;
use healthpulse_db::{ChatStore, HealthStore};
use tracing::{info, warn};

use crate::router::build_router;
use crate::state::AppState;

/// Owns startup: opens the stores, wires the provider, binds the listener.
pub struct GatewayServer {
    config: HealthPulseConfig,
}

impl GatewayServer {
    pub fn new(config: HealthPulseConfig) -> Self {
        Self { config }
    }

    pub async fn run(self) -> Result<()> {
        let db_path = Path::new(&self.config.database.path);
        let health = HealthStore::open(db_path)?;
        let chat = ChatStore::open(db_path)?;

        let api_key = self
            .config
            .llm
            .api_key
            .clone()
            .ok_or_else(|| Error::Config("GEMINI_API_KEY not set".to_string()))?;
        let provider: Arc<dyn LlmProvider> = Arc::new(
            GeminiProvider::new(api_key)
                .with_base_url(self.config.llm.base_url.clone())
                .with_timeout(Duration::from_secs(self.config.llm.request_timeout_secs)),
        );

        if !provider.health_check().await.unwrap_or(false) {
            warn!("generation provider health check failed; chat turns may be unavailable");
        }

        let addr = format!(
            "{}:{}",
            self.config.gateway.host, self.config.gateway.port
        );
        let state = Arc::new(AppState::new(self.config, health, chat, provider)?);
        let app = build_router(state);

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| Error::Config(format!("failed to bind {addr}: {e}")))?;
        info!("HealthPulse gateway listening on {addr}");

        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .map_err(|e| Error::Config(format!("server error: {e}")))?;
        Ok(())
    }
}
