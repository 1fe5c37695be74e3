use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::services::gemini_client::{GeminiClient, LanguageModel};
use crate::services::session_service::SessionService;

pub struct AppState {
    pub config: Config,
    pub sessions: SessionService,
}

impl AppState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let client = GeminiClient::new(&config.gemini)?;

        if client.is_configured() {
            tracing::info!(
                "Gemini client ready (model={}, base_url={})",
                config.gemini.model,
                config.gemini.base_url
            );
        } else {
            tracing::warn!("API_KEY is not set; generation and grading requests will fail");
        }

        Ok(Self::with_model(config, Arc::new(client)))
    }

    /// Builds the state around any language model implementation.
    pub fn with_model(config: Config, model: Arc<dyn LanguageModel>) -> Self {
        let tick = Duration::from_millis(config.timer_tick_ms);
        Self {
            sessions: SessionService::new(model, tick),
            config,
        }
    }
}

pub mod elapsed_timer;
pub mod gemini_client;
pub mod grading_service;
pub mod prompt_builder;
pub mod quiz_session;
pub mod response_parser;
pub mod session_service;
pub mod topics;
