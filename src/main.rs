//! Study Assistant · quiz and summary generation backend
//!
//! - Axum JSON API (PDF text extraction, quiz/summary generation, history)
//! - Provider fallback chain: Gemini → Groq → local Ollama → built-in content
//!
//! Important env variables:
//!   PORT              : u16 (default 3000)
//!   GEMINI_API_KEY    : enables Gemini
//!   GEMINI_MODEL      : pin a Gemini model (default: discovered)
//!   GROQ_API_KEY      : enables Groq
//!   GROQ_MODEL        : default "llama3-70b-8192"
//!   OLLAMA_ENABLED    : "true" to try a local Ollama daemon
//!   OLLAMA_BASE_URL   : default "http://localhost:11434"
//!   OLLAMA_MODEL      : default "qwen2:7b"
//!   STUDY_CONFIG_PATH : path to TOML config (limits, prompts, provider tuning)
//!   LOG_LEVEL         : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT        : "pretty" (default) or "json"

mod config;
mod domain;
mod error;
mod extract;
mod logic;
mod normalize;
mod orchestrator;
mod protocol;
mod providers;
mod ratelimit;
mod routes;
mod seeds;
mod state;
mod store;
mod telemetry;
mod util;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  let state = Arc::new(AppState::new());
  let app = build_router(state);

  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "study_assistant", %addr, "HTTP server listening");
  axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
  info!(target: "study_assistant", "Server stopped");
  Ok(())
}

async fn shutdown_signal() {
  match tokio::signal::ctrl_c().await {
    Ok(()) => info!(target: "study_assistant", "Ctrl-C received; shutting down"),
    Err(e) => warn!(target: "study_assistant", error = %e, "Could not listen for Ctrl-C; running until killed"),
  }
}
