//! Loading service configuration (limits, prompts, provider tuning) from TOML.
//!
//! Every section is optional; missing keys fall back to the defaults below.
//! Secrets never live in the file: API keys come from the environment.

use std::time::Duration;

use serde::Deserialize;
use tracing::{error, info};

#[derive(Clone, Debug, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
  pub generation: GenerationConfig,
  pub prompts: Prompts,
  pub providers: ProvidersConfig,
  pub rate_limit: RateLimitConfig,
  pub upload: UploadConfig,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
  /// Summaries of shorter texts are rejected before any provider call.
  pub min_summary_chars: usize,
  pub default_question_count: usize,
  pub min_question_count: usize,
  pub max_question_count: usize,
  pub max_key_points: usize,
  /// Overall budget for one generation call, all providers included.
  pub request_deadline_secs: u64,
  /// Output language requested from the models.
  pub language: String,
}

impl Default for GenerationConfig {
  fn default() -> Self {
    Self {
      min_summary_chars: 50,
      default_question_count: 5,
      min_question_count: 3,
      max_question_count: 10,
      max_key_points: 8,
      request_deadline_secs: 150,
      language: "English".into(),
    }
  }
}

impl GenerationConfig {
  pub fn request_deadline(&self) -> Duration {
    Duration::from_secs(self.request_deadline_secs)
  }
}

/// Prompt templates. Placeholders: `{count}`, `{language}`, `{text}`.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub system: String,
  pub quiz_multiple_choice_template: String,
  pub quiz_essay_template: String,
  pub summary_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      system: "You are an assistant that writes exam questions and study summaries. Always answer in {language} with valid, well-structured JSON.".into(),
      quiz_multiple_choice_template: r#"Write {count} multiple-choice questions in {language} based on the text below.

TEXT:
{text}

INSTRUCTIONS:
1. Write {count} high-quality questions that test understanding, not memorization.
2. Every question has exactly 4 answer options.
3. "correctAnswer" must be copied verbatim from "options".

Output format (JSON):
{
  "questions": [
    {
      "question": "Question here?",
      "options": ["Option A", "Option B", "Option C", "Option D"],
      "correctAnswer": "Option A",
      "type": "multiple_choice"
    }
  ]
}

Reply with the JSON ONLY, no extra text."#
        .into(),
      quiz_essay_template: r#"Write {count} essay questions in {language} based on the text below.

TEXT:
{text}

INSTRUCTIONS:
1. Write {count} in-depth questions that call for analysis and critical thinking.
2. Include an expected answer outline for each question.
3. Use formal, academic language.

Output format (JSON):
{
  "questions": [
    {
      "question": "Essay question here?",
      "correctAnswer": "Expected answer outline",
      "type": "essay"
    }
  ]
}

Reply with the JSON ONLY, no extra text."#
        .into(),
      summary_template: r#"Summarize the text below in {language}.

TEXT:
{text}

INSTRUCTIONS:
1. Write a clear, dense summary (2-3 paragraphs).
2. Extract the 5-8 most important key points.
3. Focus on main ideas and key concepts.

Output format (JSON):
{
  "summary": "Summary in 2-3 paragraphs...",
  "keyPoints": ["Key point 1", "Key point 2", "Key point 3"]
}

Reply with the JSON ONLY, no extra text."#
        .into(),
    }
  }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
  /// Priority order of the fallback chain.
  pub order: Vec<String>,
  pub gemini: GeminiConfig,
  pub groq: GroqConfig,
  pub ollama: OllamaConfig,
}

impl Default for ProvidersConfig {
  fn default() -> Self {
    Self {
      order: vec!["gemini".into(), "groq".into(), "ollama".into()],
      gemini: GeminiConfig::default(),
      groq: GroqConfig::default(),
      ollama: OllamaConfig::default(),
    }
  }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
  pub base_url: String,
  /// None = discover the first model that supports generateContent.
  pub model: Option<String>,
  pub max_input_chars: usize,
  pub timeout_secs: u64,
  pub temperature: f32,
  pub quiz_max_tokens: u32,
  pub summary_max_tokens: u32,
}

impl Default for GeminiConfig {
  fn default() -> Self {
    Self {
      base_url: "https://generativelanguage.googleapis.com/v1beta".into(),
      model: None,
      max_input_chars: 8000,
      timeout_secs: 30,
      temperature: 0.7,
      quiz_max_tokens: 2000,
      summary_max_tokens: 1000,
    }
  }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct GroqConfig {
  pub base_url: String,
  pub model: String,
  pub max_input_chars: usize,
  pub timeout_secs: u64,
  pub temperature: f32,
  pub max_tokens: u32,
  pub top_p: f32,
}

impl Default for GroqConfig {
  fn default() -> Self {
    Self {
      base_url: "https://api.groq.com/openai/v1".into(),
      model: "llama3-70b-8192".into(),
      max_input_chars: 4000,
      timeout_secs: 60,
      temperature: 0.7,
      max_tokens: 2048,
      top_p: 0.95,
    }
  }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
  /// Local models are opt-in; an absent daemon costs a connection refusal per call.
  pub enabled: bool,
  pub base_url: String,
  pub model: String,
  pub max_input_chars: usize,
  pub timeout_secs: u64,
  pub temperature: f32,
  pub top_p: f32,
  pub num_predict: u32,
}

impl Default for OllamaConfig {
  fn default() -> Self {
    Self {
      enabled: false,
      base_url: "http://localhost:11434".into(),
      model: "qwen2:7b".into(),
      max_input_chars: 4000,
      timeout_secs: 120,
      temperature: 0.7,
      top_p: 0.95,
      num_predict: 2000,
    }
  }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
  pub ai_points: u32,
  pub ai_window_secs: u64,
  pub api_points: u32,
  pub api_window_secs: u64,
}

impl Default for RateLimitConfig {
  fn default() -> Self {
    Self { ai_points: 3, ai_window_secs: 60, api_points: 10, api_window_secs: 60 }
  }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
  pub max_size_mb: usize,
}

impl Default for UploadConfig {
  fn default() -> Self {
    Self { max_size_mb: 10 }
  }
}

impl AppConfig {
  /// Load from STUDY_CONFIG_PATH (if set), then apply env overrides.
  /// On any parsing/IO error the defaults are used.
  pub fn load() -> Self {
    let mut cfg = load_config_from_env().unwrap_or_default();
    cfg.apply_env_overrides(|key| std::env::var(key).ok());
    cfg
  }

  /// Non-secret knobs that are handy to flip from the environment.
  pub fn apply_env_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
    if let Some(model) = var("GEMINI_MODEL").filter(|m| !m.is_empty()) {
      self.providers.gemini.model = Some(model);
    }
    if let Some(model) = var("GROQ_MODEL").filter(|m| !m.is_empty()) {
      self.providers.groq.model = model;
    }
    if let Some(url) = var("OLLAMA_BASE_URL").filter(|u| !u.is_empty()) {
      self.providers.ollama.base_url = url;
    }
    if let Some(model) = var("OLLAMA_MODEL").filter(|m| !m.is_empty()) {
      self.providers.ollama.model = model;
    }
    if let Some(flag) = var("OLLAMA_ENABLED") {
      self.providers.ollama.enabled = matches!(flag.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes");
    }
  }
}

pub fn parse_config(raw: &str) -> Result<AppConfig, toml::de::Error> {
  toml::from_str::<AppConfig>(raw)
}

/// Attempt to load `AppConfig` from STUDY_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_config_from_env() -> Option<AppConfig> {
  let path = std::env::var("STUDY_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match parse_config(&s) {
      Ok(cfg) => {
        info!(target: "study_assistant", %path, "Loaded config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "study_assistant", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "study_assistant", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}
