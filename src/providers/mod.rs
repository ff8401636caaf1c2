//! Text-generation providers and the ordered chain the orchestrator walks.
//!
//! Each provider adapts one HTTP API to the `Provider` trait. Prompt rendering
//! and normalization have default implementations; a provider overrides them
//! only when its model needs a different envelope.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize};
use tracing::{info, warn};

use crate::config::{Prompts, ProvidersConfig};
use crate::domain::{GenerationOutput, GenerationRequest, OutputKind, QuizType};
use crate::error::ProviderError;
use crate::normalize::{normalize_quiz, normalize_summary};
use crate::util::{fill_template, truncate_chars};

pub mod gemini;
pub mod groq;
pub mod ollama;

pub use gemini::GeminiProvider;
pub use groq::GroqProvider;
pub use ollama::OllamaProvider;

pub(crate) const USER_AGENT_VALUE: &str = "study-assistant/0.1";

/// Rendered prompt: system instructions plus the task itself.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Prompt {
  pub system: String,
  pub user: String,
}

#[async_trait]
pub trait Provider: Send + Sync {
  fn name(&self) -> &str;

  /// Source text is cut to this many characters before prompting.
  fn max_input_chars(&self) -> usize;

  fn build_prompt(&self, prompts: &Prompts, language: &str, request: &GenerationRequest) -> Prompt {
    render_prompt(prompts, language, request, self.max_input_chars())
  }

  /// One call, one answer. Returns the model's raw text.
  async fn invoke(&self, prompt: &Prompt, kind: OutputKind) -> Result<String, ProviderError>;

  fn normalize(
    &self,
    raw: &str,
    request: &GenerationRequest,
    max_key_points: usize,
  ) -> Result<GenerationOutput, ProviderError> {
    normalize_output(raw, request, max_key_points)
  }
}

/// Fill the template matching the request. `{text}` is truncated to `max_chars`.
pub fn render_prompt(prompts: &Prompts, language: &str, request: &GenerationRequest, max_chars: usize) -> Prompt {
  let template = match (request.output_kind, request.quiz_type) {
    (OutputKind::Summary, _) => &prompts.summary_template,
    (OutputKind::Quiz, Some(QuizType::Essay)) => &prompts.quiz_essay_template,
    (OutputKind::Quiz, _) => &prompts.quiz_multiple_choice_template,
  };
  let count = request.question_count.to_string();
  let text = truncate_chars(&request.source_text, max_chars);
  Prompt {
    system: fill_template(&prompts.system, &[("language", language)]),
    user: fill_template(template, &[("count", &count), ("language", language), ("text", text)]),
  }
}

pub fn normalize_output(
  raw: &str,
  request: &GenerationRequest,
  max_key_points: usize,
) -> Result<GenerationOutput, ProviderError> {
  match request.output_kind {
    OutputKind::Quiz => {
      let quiz_type = request
        .quiz_type
        .ok_or_else(|| ProviderError::shape("quiz request without a quiz type"))?;
      normalize_quiz(raw, quiz_type, request.question_count).map(GenerationOutput::Quiz)
    }
    OutputKind::Summary => normalize_summary(raw, max_key_points).map(GenerationOutput::Summary),
  }
}

/// Ordered provider list. Earlier entries are tried first.
#[derive(Clone, Default)]
pub struct ProviderChain {
  providers: Vec<Arc<dyn Provider>>,
}

impl ProviderChain {
  pub fn new(providers: Vec<Arc<dyn Provider>>) -> Self {
    Self { providers }
  }

  pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Provider>> {
    self.providers.iter()
  }

  pub fn len(&self) -> usize {
    self.providers.len()
  }

  pub fn is_empty(&self) -> bool {
    self.providers.is_empty()
  }

  pub fn names(&self) -> Vec<String> {
    self.providers.iter().map(|p| p.name().to_string()).collect()
  }

  /// Build the chain in `cfg.order`, skipping providers without credentials.
  /// `var` reads secrets (normally `std::env::var`).
  pub fn from_config(cfg: &ProvidersConfig, var: impl Fn(&str) -> Option<String>) -> Self {
    let mut providers: Vec<Arc<dyn Provider>> = Vec::new();
    for name in &cfg.order {
      let built: Result<Arc<dyn Provider>, ProviderError> = match name.as_str() {
        "gemini" => GeminiProvider::from_config(&cfg.gemini, var("GEMINI_API_KEY")).map(|p| Arc::new(p) as Arc<dyn Provider>),
        "groq" => GroqProvider::from_config(&cfg.groq, var("GROQ_API_KEY")).map(|p| Arc::new(p) as Arc<dyn Provider>),
        "ollama" => OllamaProvider::from_config(&cfg.ollama).map(|p| Arc::new(p) as Arc<dyn Provider>),
        other => {
          warn!(target: "study_assistant", provider = %other, "Unknown provider in order; skipping");
          continue;
        }
      };
      match built {
        Ok(p) => {
          info!(target: "study_assistant", provider = %p.name(), max_input_chars = p.max_input_chars(), "Provider enabled");
          providers.push(p);
        }
        Err(e) => info!(target: "study_assistant", provider = %name, reason = %e, "Provider disabled"),
      }
    }
    let chain = Self { providers };
    if chain.is_empty() {
      warn!(target: "study_assistant", "No provider configured; every request will get the built-in fallback");
    }
    chain
  }
}

pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client, ProviderError> {
  reqwest::Client::builder()
    .timeout(timeout)
    .user_agent(USER_AGENT_VALUE)
    .build()
    .map_err(ProviderError::Network)
}

/// Map a transport failure, keeping timeouts distinguishable in logs.
pub(crate) fn transport_error(e: reqwest::Error, timeout: Duration) -> ProviderError {
  if e.is_timeout() { ProviderError::Timeout(timeout) } else { ProviderError::Network(e) }
}

/// Pass 2xx responses through; turn anything else into a classified error.
pub(crate) async fn check_status(res: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
  let status = res.status();
  if status.is_success() {
    return Ok(res);
  }
  let body = res.text().await.unwrap_or_default();
  let message = extract_error_message(&body).unwrap_or(body);
  Err(ProviderError::from_status(status, message))
}

/// Decode a 2xx body. A body that is not the expected envelope is a
/// malformed response, not a network failure.
pub(crate) async fn read_json<T: DeserializeOwned>(res: reqwest::Response) -> Result<T, ProviderError> {
  let body = res.text().await.map_err(ProviderError::Network)?;
  serde_json::from_str(&body).map_err(|e| ProviderError::Malformed(format!("unexpected response body: {e}")))
}

/// Pull a readable message out of the common error envelopes:
/// `{"error":{"message":"..."}}` and `{"error":"..."}`.
fn extract_error_message(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap {
    error: EBody,
  }
  #[derive(Deserialize)]
  #[serde(untagged)]
  enum EBody {
    Obj { message: String },
    Text(String),
  }
  match serde_json::from_str::<EWrap>(body).ok()?.error {
    EBody::Obj { message } => Some(message),
    EBody::Text(t) => Some(t),
  }
}
