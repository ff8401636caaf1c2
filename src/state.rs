//! Application state shared by all handlers.
//!
//! This module owns:
//!   - the loaded configuration
//!   - the generation orchestrator and its provider chain
//!   - the two rate limiters (AI generation, plain API)
//!   - the history store

use std::{
  sync::Arc,
  time::{Duration, Instant},
};

use tracing::{info, instrument};

use crate::config::AppConfig;
use crate::orchestrator::{GenerationSettings, Orchestrator};
use crate::providers::ProviderChain;
use crate::ratelimit::RateLimiter;
use crate::store::{HistoryStore, MemoryStore};

pub struct AppState {
  pub config: AppConfig,
  pub orchestrator: Orchestrator,
  pub ai_limiter: RateLimiter,
  pub api_limiter: RateLimiter,
  pub store: Arc<dyn HistoryStore>,
  pub started_at: Instant,
}

impl AppState {
  /// Build state from env: load config, enable providers that have credentials.
  #[instrument(level = "info", skip_all)]
  pub fn new() -> Self {
    let config = AppConfig::load();
    let chain = ProviderChain::from_config(&config.providers, |key| std::env::var(key).ok());
    let state = Self::with_parts(config, chain, Arc::new(MemoryStore::new()));
    info!(
      target: "study_assistant",
      providers = ?state.orchestrator.provider_names(),
      language = %state.config.generation.language,
      deadline_secs = state.config.generation.request_deadline_secs,
      "Application state ready"
    );
    state
  }

  pub fn with_parts(config: AppConfig, chain: ProviderChain, store: Arc<dyn HistoryStore>) -> Self {
    let rl = &config.rate_limit;
    let ai_limiter = RateLimiter::new("ai", rl.ai_points, Duration::from_secs(rl.ai_window_secs));
    let api_limiter = RateLimiter::new("api", rl.api_points, Duration::from_secs(rl.api_window_secs));
    let orchestrator = Orchestrator::new(chain, GenerationSettings::from_config(&config));
    Self { config, orchestrator, ai_limiter, api_limiter, store, started_at: Instant::now() }
  }
}
