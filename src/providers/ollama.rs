//! Local model served by Ollama (`/api/generate`). No API key.
//!
//! Qwen-family models behave best with the ChatML envelope, so the prompt is
//! wrapped in `<|im_start|>` / `<|im_end|>` markers and those markers are
//! stripped again before normalization.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use super::{check_status, http_client, normalize_output, read_json, transport_error, Prompt, Provider};
use crate::config::{OllamaConfig, Prompts};
use crate::domain::{GenerationOutput, GenerationRequest, OutputKind};
use crate::error::ProviderError;

const IM_START: &str = "<|im_start|>";
const IM_END: &str = "<|im_end|>";

pub struct OllamaProvider {
  client: reqwest::Client,
  base_url: String,
  model: String,
  max_input_chars: usize,
  timeout: Duration,
  temperature: f32,
  top_p: f32,
  num_predict: u32,
}

impl OllamaProvider {
  pub fn from_config(cfg: &OllamaConfig) -> Result<Self, ProviderError> {
    if !cfg.enabled {
      return Err(ProviderError::NotConfigured("ollama disabled (set OLLAMA_ENABLED=true)".into()));
    }
    let timeout = Duration::from_secs(cfg.timeout_secs);
    Ok(Self {
      client: http_client(timeout)?,
      base_url: cfg.base_url.trim_end_matches('/').to_string(),
      model: cfg.model.clone(),
      max_input_chars: cfg.max_input_chars,
      timeout,
      temperature: cfg.temperature,
      top_p: cfg.top_p,
      num_predict: cfg.num_predict,
    })
  }
}

/// Render system + user into a single ChatML prompt ending at the assistant turn.
pub fn chatml(system: &str, user: &str) -> String {
  format!("{IM_START}system\n{system}\n{IM_END}\n{IM_START}user\n{user}\n{IM_END}\n{IM_START}assistant")
}

fn strip_chat_markers(raw: &str) -> String {
  raw.replace(IM_END, "").replace(&format!("{IM_START}assistant"), "").replace(IM_START, "")
}

#[async_trait]
impl Provider for OllamaProvider {
  fn name(&self) -> &str {
    "ollama"
  }

  fn max_input_chars(&self) -> usize {
    self.max_input_chars
  }

  fn build_prompt(&self, prompts: &Prompts, language: &str, request: &GenerationRequest) -> Prompt {
    let base = super::render_prompt(prompts, language, request, self.max_input_chars);
    Prompt { system: String::new(), user: chatml(&base.system, &base.user) }
  }

  #[instrument(level = "info", skip(self, prompt), fields(model = %self.model, prompt_len = prompt.user.len()))]
  async fn invoke(&self, prompt: &Prompt, _kind: OutputKind) -> Result<String, ProviderError> {
    let url = format!("{}/api/generate", self.base_url);
    let req = GenerateRequest {
      model: self.model.clone(),
      prompt: prompt.user.clone(),
      stream: false,
      options: GenerateOptions { temperature: self.temperature, top_p: self.top_p, num_predict: self.num_predict },
    };

    let start = Instant::now();
    let res = self
      .client
      .post(&url)
      .header(CONTENT_TYPE, "application/json")
      .json(&req)
      .send()
      .await
      .map_err(|e| transport_error(e, self.timeout))?;
    let body: GenerateResponse = read_json(check_status(res).await?).await?;

    let text = body.response.trim().to_string();
    if text.is_empty() {
      return Err(ProviderError::EmptyResponse);
    }
    info!(target: "generation", elapsed_ms = start.elapsed().as_millis() as u64, response_len = text.len(), "Ollama response received");
    Ok(text)
  }

  fn normalize(
    &self,
    raw: &str,
    request: &GenerationRequest,
    max_key_points: usize,
  ) -> Result<GenerationOutput, ProviderError> {
    normalize_output(&strip_chat_markers(raw), request, max_key_points)
  }
}

#[derive(Serialize)]
struct GenerateRequest {
  model: String,
  prompt: String,
  stream: bool,
  options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
  temperature: f32,
  top_p: f32,
  num_predict: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
  #[serde(default)]
  response: String,
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::QuizType;
  use serde_json::json;
  use wiremock::matchers::{body_partial_json, method, path};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  fn provider(base_url: &str) -> OllamaProvider {
    OllamaProvider::from_config(&OllamaConfig { enabled: true, base_url: base_url.into(), ..OllamaConfig::default() })
      .expect("provider builds")
  }

  #[test]
  fn disabled_by_default() {
    assert!(matches!(OllamaProvider::from_config(&OllamaConfig::default()), Err(ProviderError::NotConfigured(_))));
  }

  #[test]
  fn prompt_is_wrapped_in_chatml() {
    let p = provider("http://localhost:11434");
    let prompt = p.build_prompt(&Prompts::default(), "English", &GenerationRequest::summary("some study text"));
    assert!(prompt.user.starts_with("<|im_start|>system\n"));
    assert!(prompt.user.ends_with("<|im_start|>assistant"));
    assert!(prompt.user.contains("some study text"));
  }

  #[test]
  fn end_markers_do_not_break_normalization() {
    let p = provider("http://localhost:11434");
    let raw = r#"{"questions":[{"question":"Why?","correctAnswer":"Because","type":"essay"}]}<|im_end|>"#;
    let out = p.normalize(raw, &GenerationRequest::quiz("t", QuizType::Essay, 3), 8).expect("normalizes");
    assert!(matches!(out, GenerationOutput::Quiz(ref qs) if qs.len() == 1));
  }

  #[tokio::test]
  async fn posts_non_streaming_generate() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/api/generate"))
      .and(body_partial_json(json!({ "model": "qwen2:7b", "stream": false })))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "model": "qwen2:7b", "response": " hi ", "done": true })))
      .expect(1)
      .mount(&server)
      .await;

    let text = provider(&server.uri()).invoke(&Prompt::default(), OutputKind::Summary).await.expect("call succeeds");
    assert_eq!(text, "hi");
  }

  #[tokio::test]
  async fn model_not_pulled_surfaces_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "error": "model 'qwen2:7b' not found" })))
      .mount(&server)
      .await;

    let err = provider(&server.uri()).invoke(&Prompt::default(), OutputKind::Quiz).await.unwrap_err();
    assert!(matches!(err, ProviderError::Status { status: 404, ref message } if message.contains("not found")), "got {err:?}");
  }
}
