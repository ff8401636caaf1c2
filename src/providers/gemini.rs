//! Google Gemini via the Generative Language REST API (`generateContent`).
//!
//! When no model is configured, the first model that advertises
//! `generateContent` is discovered once and cached for the process lifetime.
//! We never log the API key; it travels in the `x-goog-api-key` header.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{info, instrument, warn};

use super::{check_status, http_client, read_json, transport_error, Prompt, Provider};
use crate::config::GeminiConfig;
use crate::domain::OutputKind;
use crate::error::ProviderError;

pub const DEFAULT_MODEL: &str = "gemini-2.5-pro";
const API_KEY_HEADER: &str = "x-goog-api-key";

pub struct GeminiProvider {
  client: reqwest::Client,
  api_key: String,
  base_url: String,
  configured_model: Option<String>,
  discovered_model: OnceCell<String>,
  max_input_chars: usize,
  timeout: Duration,
  temperature: f32,
  quiz_max_tokens: u32,
  summary_max_tokens: u32,
}

impl GeminiProvider {
  pub fn from_config(cfg: &GeminiConfig, api_key: Option<String>) -> Result<Self, ProviderError> {
    let api_key = api_key
      .filter(|k| !k.trim().is_empty())
      .ok_or_else(|| ProviderError::NotConfigured("GEMINI_API_KEY not set".into()))?;
    if !(api_key.starts_with("AIza") && api_key.len() > 30) {
      warn!(target: "study_assistant", "GEMINI_API_KEY format looks unusual (expected AIza...)");
    }
    let timeout = Duration::from_secs(cfg.timeout_secs);
    Ok(Self {
      client: http_client(timeout)?,
      api_key,
      base_url: cfg.base_url.trim_end_matches('/').to_string(),
      configured_model: cfg.model.clone().filter(|m| !m.is_empty()),
      discovered_model: OnceCell::new(),
      max_input_chars: cfg.max_input_chars,
      timeout,
      temperature: cfg.temperature,
      quiz_max_tokens: cfg.quiz_max_tokens,
      summary_max_tokens: cfg.summary_max_tokens,
    })
  }

  async fn model(&self) -> &str {
    if let Some(m) = &self.configured_model {
      return m;
    }
    self.discovered_model.get_or_init(|| self.discover_model()).await
  }

  /// First model supporting generateContent; DEFAULT_MODEL if listing fails.
  #[instrument(level = "info", skip(self))]
  async fn discover_model(&self) -> String {
    match self.list_models().await {
      Ok(models) => {
        let found = models
          .into_iter()
          .find(|m| m.supported_generation_methods.iter().any(|g| g == "generateContent"))
          .map(|m| m.name.trim_start_matches("models/").to_string());
        match found {
          Some(name) => {
            info!(target: "generation", model = %name, "Gemini model discovered");
            name
          }
          None => {
            warn!(target: "generation", fallback = DEFAULT_MODEL, "No Gemini model supports generateContent");
            DEFAULT_MODEL.to_string()
          }
        }
      }
      Err(e) => {
        warn!(target: "generation", error = %e, fallback = DEFAULT_MODEL, "Gemini model listing failed");
        DEFAULT_MODEL.to_string()
      }
    }
  }

  async fn list_models(&self) -> Result<Vec<ModelInfo>, ProviderError> {
    let url = format!("{}/models", self.base_url);
    let res = self
      .client
      .get(&url)
      .header(API_KEY_HEADER, &self.api_key)
      .send()
      .await
      .map_err(|e| transport_error(e, self.timeout))?;
    let body: ModelList = read_json(check_status(res).await?).await?;
    Ok(body.models)
  }
}

#[async_trait]
impl Provider for GeminiProvider {
  fn name(&self) -> &str {
    "gemini"
  }

  fn max_input_chars(&self) -> usize {
    self.max_input_chars
  }

  #[instrument(level = "info", skip(self, prompt), fields(prompt_len = prompt.user.len()))]
  async fn invoke(&self, prompt: &Prompt, kind: OutputKind) -> Result<String, ProviderError> {
    let model = self.model().await.to_string();
    let url = format!("{}/models/{}:generateContent", self.base_url, model);
    let max_output_tokens = match kind {
      OutputKind::Quiz => self.quiz_max_tokens,
      OutputKind::Summary => self.summary_max_tokens,
    };
    let system_instruction = (!prompt.system.trim().is_empty())
      .then(|| Content { parts: vec![Part { text: prompt.system.clone() }] });
    let req = GenerateRequest {
      system_instruction,
      contents: vec![Content { parts: vec![Part { text: prompt.user.clone() }] }],
      generation_config: GenerationConfig { temperature: self.temperature, max_output_tokens },
    };

    let start = Instant::now();
    let res = self
      .client
      .post(&url)
      .header(CONTENT_TYPE, "application/json")
      .header(API_KEY_HEADER, &self.api_key)
      .json(&req)
      .send()
      .await
      .map_err(|e| transport_error(e, self.timeout))?;
    let body: GenerateResponse = read_json(check_status(res).await?).await?;

    let text = body
      .candidates
      .into_iter()
      .next()
      .and_then(|c| c.content)
      .and_then(|c| c.parts.into_iter().next())
      .map(|p| p.text)
      .unwrap_or_default();
    if text.trim().is_empty() {
      return Err(ProviderError::EmptyResponse);
    }
    info!(target: "generation", %model, elapsed_ms = start.elapsed().as_millis() as u64, response_len = text.len(), "Gemini response received");
    Ok(text)
  }
}

// --- Wire DTOs ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
  #[serde(skip_serializing_if = "Option::is_none")]
  system_instruction: Option<Content>,
  contents: Vec<Content>,
  generation_config: GenerationConfig,
}

#[derive(Serialize, Deserialize)]
struct Content {
  #[serde(default)]
  parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
  #[serde(default)]
  text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
  temperature: f32,
  max_output_tokens: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
  #[serde(default)]
  candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
  #[serde(default)]
  content: Option<Content>,
}

#[derive(Deserialize)]
struct ModelList {
  #[serde(default)]
  models: Vec<ModelInfo>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelInfo {
  name: String,
  #[serde(default)]
  supported_generation_methods: Vec<String>,
}
