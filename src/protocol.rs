//! Public request/response structs for the HTTP API (serde ready).
//! Field names are camelCase on the wire.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{GenerationRequest, QuizQuestion, QuizType};
use crate::error::ValidationError;
use crate::store::{DocumentRecord, HistoryEntry, QuizRecord, SummaryRecord};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthOut {
  pub status: &'static str,
  pub version: &'static str,
  pub uptime_secs: u64,
  pub timestamp: DateTime<Utc>,
  /// Enabled providers, in the order they are tried.
  pub providers: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractIn {
  pub file_name: String,
  pub data_base64: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractOut {
  pub text: String,
  pub num_pages: usize,
  pub file_name: String,
}

/// Quiz request. Everything is optional at the serde level so that missing
/// fields become validation errors with a readable message instead of a
/// JSON rejection.
#[derive(Debug, Default, Deserialize)]
pub struct QuizIn {
  #[serde(default)]
  pub text: Option<String>,
  #[serde(default, rename = "type")]
  pub quiz_type: Option<String>,
  #[serde(default)]
  pub count: Option<i64>,
  #[serde(default)]
  pub title: Option<String>,
}

impl QuizIn {
  pub fn to_request(&self, default_count: usize) -> Result<GenerationRequest, ValidationError> {
    let text = self.text.as_deref().unwrap_or_default();
    if text.trim().is_empty() {
      return Err(ValidationError::EmptyText);
    }
    let quiz_type = match self.quiz_type.as_deref() {
      None | Some("") => return Err(ValidationError::MissingQuizType),
      Some(raw) => QuizType::parse(raw)?,
    };
    let count = match self.count {
      None => default_count,
      Some(n) if n <= 0 => return Err(ValidationError::InvalidCount(n)),
      Some(n) => usize::try_from(n).unwrap_or(usize::MAX),
    };
    Ok(GenerationRequest::quiz(text, quiz_type, count))
  }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizOut {
  pub questions: Vec<QuizQuestion>,
  pub total_questions: usize,
  #[serde(rename = "type")]
  pub quiz_type: QuizType,
  /// Provider name, or "fallback".
  pub source: String,
  pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SummaryIn {
  #[serde(default)]
  pub text: Option<String>,
  #[serde(default)]
  pub title: Option<String>,
}

impl SummaryIn {
  pub fn to_request(&self) -> Result<GenerationRequest, ValidationError> {
    let text = self.text.as_deref().unwrap_or_default();
    if text.trim().is_empty() {
      return Err(ValidationError::EmptyText);
    }
    Ok(GenerationRequest::summary(text))
  }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryOut {
  pub summary: String,
  pub key_points: Vec<String>,
  pub original_length: usize,
  pub summary_length: usize,
  /// Summary length as a rounded percentage of the original.
  pub compression_ratio: u32,
  pub source: String,
  pub generated_at: DateTime<Utc>,
}

pub fn compression_ratio(summary_len: usize, original_len: usize) -> u32 {
  if original_len == 0 {
    return 0;
  }
  ((summary_len as f64 / original_len as f64) * 100.0).round() as u32
}

#[derive(Debug, Serialize)]
pub struct HistoryOut {
  pub history: Vec<HistoryEntry>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentOut {
  pub id: String,
  pub title: String,
  pub content: String,
}

impl From<DocumentRecord> for DocumentOut {
  fn from(d: DocumentRecord) -> Self {
    Self { id: d.id, title: d.title, content: d.content }
  }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizDetailOut {
  pub quiz: QuizRecord,
  pub document: Option<DocumentOut>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryDetailOut {
  pub summary: SummaryRecord,
  pub document: Option<DocumentOut>,
}

#[derive(Debug, Serialize)]
pub struct DeletedOut {
  pub deleted: bool,
}
