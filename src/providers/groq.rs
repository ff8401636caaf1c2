//! Groq via its OpenAI-compatible chat.completions endpoint.
//!
//! One system message plus one user message, non-streaming.
//! Calls log model names, latencies and response sizes (not contents).

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use super::{check_status, http_client, read_json, transport_error, Prompt, Provider};
use crate::config::GroqConfig;
use crate::domain::OutputKind;
use crate::error::ProviderError;

#[derive(Clone)]
pub struct GroqProvider {
  client: reqwest::Client,
  api_key: String,
  base_url: String,
  model: String,
  max_input_chars: usize,
  timeout: Duration,
  temperature: f32,
  max_tokens: u32,
  top_p: f32,
}

/// Template values copied from `.env.example` are not keys.
fn is_placeholder_key(key: &str) -> bool {
  key.trim().is_empty() || key.contains("your-groq-api-key")
}

impl GroqProvider {
  /// Construct the client if we have a usable key; otherwise NotConfigured.
  pub fn from_config(cfg: &GroqConfig, api_key: Option<String>) -> Result<Self, ProviderError> {
    let api_key = api_key
      .filter(|k| !is_placeholder_key(k))
      .ok_or_else(|| ProviderError::NotConfigured("GROQ_API_KEY not set".into()))?;
    let timeout = Duration::from_secs(cfg.timeout_secs);
    Ok(Self {
      client: http_client(timeout)?,
      api_key,
      base_url: cfg.base_url.trim_end_matches('/').to_string(),
      model: cfg.model.clone(),
      max_input_chars: cfg.max_input_chars,
      timeout,
      temperature: cfg.temperature,
      max_tokens: cfg.max_tokens,
      top_p: cfg.top_p,
    })
  }
}

#[async_trait]
impl Provider for GroqProvider {
  fn name(&self) -> &str {
    "groq"
  }

  fn max_input_chars(&self) -> usize {
    self.max_input_chars
  }

  #[instrument(level = "info", skip(self, prompt), fields(model = %self.model, prompt_len = prompt.user.len()))]
  async fn invoke(&self, prompt: &Prompt, _kind: OutputKind) -> Result<String, ProviderError> {
    let url = format!("{}/chat/completions", self.base_url);
    let req = ChatCompletionRequest {
      model: self.model.clone(),
      messages: vec![
        ChatMessageReq { role: "system".into(), content: prompt.system.clone() },
        ChatMessageReq { role: "user".into(), content: prompt.user.clone() },
      ],
      temperature: self.temperature,
      max_tokens: Some(self.max_tokens),
      top_p: self.top_p,
      stream: false,
    };

    let start = Instant::now();
    let res = self
      .client
      .post(&url)
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&req)
      .send()
      .await
      .map_err(|e| transport_error(e, self.timeout))?;

    let body: ChatCompletionResponse = read_json(check_status(res).await?).await?;
    if let Some(usage) = &body.usage {
      info!(target: "generation", prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "Groq usage");
    }
    let text = body
      .choices
      .into_iter()
      .next()
      .and_then(|c| c.message.content)
      .unwrap_or_default()
      .trim()
      .to_string();
    if text.is_empty() {
      return Err(ProviderError::EmptyResponse);
    }

    info!(target: "generation", elapsed_ms = start.elapsed().as_millis() as u64, response_len = text.len(), "Groq response received");
    Ok(text)
  }
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  max_tokens: Option<u32>,
  top_p: f32,
  stream: bool,
}
#[derive(Serialize)]
struct ChatMessageReq { role: String, content: String }

#[derive(Deserialize)]
struct ChatCompletionResponse {
  #[serde(default)] choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { #[serde(default)] content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;
  use wiremock::matchers::{body_partial_json, header, method, path};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  fn provider(base_url: &str) -> GroqProvider {
    let cfg = GroqConfig { base_url: base_url.to_string(), ..GroqConfig::default() };
    GroqProvider::from_config(&cfg, Some("gsk_test".into())).expect("provider builds")
  }

  #[test]
  fn placeholder_keys_are_rejected() {
    assert!(GroqProvider::from_config(&GroqConfig::default(), Some("your-groq-api-key-here".into())).is_err());
    assert!(GroqProvider::from_config(&GroqConfig::default(), None).is_err());
    assert!(GroqProvider::from_config(&GroqConfig::default(), Some("gsk_live".into())).is_ok());
  }

  #[tokio::test]
  async fn sends_system_and_user_messages() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/chat/completions"))
      .and(header("authorization", "Bearer gsk_test"))
      .and(body_partial_json(json!({
        "model": "llama3-70b-8192",
        "stream": false,
        "messages": [
          { "role": "system", "content": "be terse" },
          { "role": "user", "content": "summarize" }
        ]
      })))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "choices": [{ "message": { "role": "assistant", "content": "  {\"summary\":\"s\",\"keyPoints\":[\"k\"]}  " } }],
        "usage": { "prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15 }
      })))
      .expect(1)
      .mount(&server)
      .await;

    let prompt = Prompt { system: "be terse".into(), user: "summarize".into() };
    let text = provider(&server.uri()).invoke(&prompt, OutputKind::Summary).await.expect("call succeeds");
    assert_eq!(text, "{\"summary\":\"s\",\"keyPoints\":[\"k\"]}");
  }

  #[tokio::test]
  async fn rate_limit_is_classified() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .respond_with(ResponseTemplate::new(429).set_body_json(json!({ "error": { "message": "Rate limit reached" } })))
      .mount(&server)
      .await;

    let err = provider(&server.uri()).invoke(&Prompt::default(), OutputKind::Quiz).await.unwrap_err();
    assert!(matches!(err, ProviderError::RateLimited(ref m) if m == "Rate limit reached"), "got {err:?}");
  }

  #[tokio::test]
  async fn unreachable_host_is_a_network_error() {
    // Nothing listens on port 9 locally.
    let err = provider("http://127.0.0.1:9").invoke(&Prompt::default(), OutputKind::Quiz).await.unwrap_err();
    assert!(matches!(err, ProviderError::Network(_) | ProviderError::Timeout(_)), "got {err:?}");
  }
}
