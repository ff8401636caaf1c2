//! Domain models used by the backend: generation requests, quiz questions,
//! summaries, and the bookkeeping records of a generation run.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// What the caller wants back from a generation run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputKind {
  Quiz,
  Summary,
}

/// Question style of a quiz.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuizType {
  /// Four options, one of which is the correct answer.
  MultipleChoice,
  /// Open question; `correct_answer` holds the expected answer outline.
  Essay,
}

impl QuizType {
  pub fn as_str(&self) -> &'static str {
    match self {
      QuizType::MultipleChoice => "multiple_choice",
      QuizType::Essay => "essay",
    }
  }

  /// Parse the wire name (`multiple_choice` / `essay`).
  pub fn parse(raw: &str) -> Result<Self, ValidationError> {
    match raw.trim() {
      "multiple_choice" => Ok(QuizType::MultipleChoice),
      "essay" => Ok(QuizType::Essay),
      other => Err(ValidationError::InvalidQuizType(other.to_string())),
    }
  }
}

impl fmt::Display for QuizType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Normalized input of one generation run.
#[derive(Clone, Debug)]
pub struct GenerationRequest {
  pub source_text: String,
  pub output_kind: OutputKind,
  /// Required iff `output_kind == Quiz`.
  pub quiz_type: Option<QuizType>,
  pub question_count: usize,
}

impl GenerationRequest {
  pub const DEFAULT_QUESTION_COUNT: usize = 5;

  pub fn quiz(source_text: impl Into<String>, quiz_type: QuizType, question_count: usize) -> Self {
    Self {
      source_text: source_text.into(),
      output_kind: OutputKind::Quiz,
      quiz_type: Some(quiz_type),
      question_count,
    }
  }

  pub fn summary(source_text: impl Into<String>) -> Self {
    Self {
      source_text: source_text.into(),
      output_kind: OutputKind::Summary,
      quiz_type: None,
      question_count: Self::DEFAULT_QUESTION_COUNT,
    }
  }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
  pub question: String,
  /// Exactly four entries for multiple-choice, absent for essay.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub options: Option<Vec<String>>,
  pub correct_answer: String,
  #[serde(rename = "type")]
  pub kind: QuizType,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryResult {
  pub summary: String,
  pub key_points: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum GenerationOutput {
  Quiz(Vec<QuizQuestion>),
  Summary(SummaryResult),
}

/// One provider attempt. Ephemeral: only logged, never persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderAttemptRecord {
  pub provider: String,
  pub succeeded: bool,
  pub error: Option<String>,
}

/// Who produced the returned output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GenerationSource {
  Provider(String),
  Fallback,
}

impl fmt::Display for GenerationSource {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      GenerationSource::Provider(name) => f.write_str(name),
      GenerationSource::Fallback => f.write_str("fallback"),
    }
  }
}

/// Result of `Orchestrator::generate`.
#[derive(Clone, Debug)]
pub struct Generation {
  pub output: GenerationOutput,
  pub attempts: Vec<ProviderAttemptRecord>,
  pub source: GenerationSource,
}
