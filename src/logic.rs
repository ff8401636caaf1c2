//! Core behaviors behind the HTTP handlers.
//!
//! This includes:
//!   - caller identity and rate-limit keys from request headers
//!   - PDF upload extraction
//!   - quiz / summary generation, response shaping, background persistence

use axum::http::HeaderMap;
use chrono::Utc;
use tracing::{info, instrument};

use crate::domain::{GenerationOutput, QuizType};
use crate::error::ApiError;
use crate::extract::{check_upload, decode_base64, extract_pdf_blocking};
use crate::protocol::{compression_ratio, ExtractIn, ExtractOut, QuizIn, QuizOut, SummaryIn, SummaryOut};
use crate::ratelimit::RateLimiter;
use crate::state::AppState;
use crate::store::{spawn_save_quiz, spawn_save_summary};
use crate::util::derive_title;

pub const USER_HEADER: &str = "x-user-id";

/// Authenticated user, if the caller identified itself.
pub fn user_id(headers: &HeaderMap) -> Option<String> {
  headers
    .get(USER_HEADER)
    .and_then(|v| v.to_str().ok())
    .map(str::trim)
    .filter(|v| !v.is_empty())
    .map(str::to_string)
}

/// Rate-limit key: user id, else first `x-forwarded-for` hop, else "anonymous".
pub fn client_key(headers: &HeaderMap) -> String {
  if let Some(user) = user_id(headers) {
    return user;
  }
  headers
    .get("x-forwarded-for")
    .and_then(|v| v.to_str().ok())
    .and_then(|v| v.split(',').next())
    .map(str::trim)
    .filter(|v| !v.is_empty())
    .map(str::to_string)
    .unwrap_or_else(|| "anonymous".into())
}

pub async fn ensure_quota(limiter: &RateLimiter, headers: &HeaderMap) -> Result<(), ApiError> {
  if limiter.consume(&client_key(headers)).await {
    Ok(())
  } else {
    Err(ApiError::RateLimited)
  }
}

#[instrument(level = "info", skip(state, body), fields(file_name = %body.file_name, payload_len = body.data_base64.len()))]
pub async fn extract_text(state: &AppState, body: ExtractIn) -> Result<ExtractOut, ApiError> {
  let max_mb = state.config.upload.max_size_mb;
  // Cheap pre-check on the encoded size (base64 inflates by 4/3).
  check_upload(&body.file_name, body.data_base64.len() / 4 * 3, max_mb)?;
  let bytes = decode_base64(&body.data_base64)?;
  check_upload(&body.file_name, bytes.len(), max_mb)?;

  let extracted = extract_pdf_blocking(bytes).await?;
  info!(target: "study_assistant", pages = extracted.page_count, text_len = extracted.text.len(), "Text extracted");
  Ok(ExtractOut { text: extracted.text, num_pages: extracted.page_count, file_name: body.file_name })
}

/// Bad input is rejected before the caller's AI quota is touched.
#[instrument(level = "info", skip(state, headers, body))]
pub async fn generate_quiz(state: &AppState, headers: &HeaderMap, body: QuizIn) -> Result<QuizOut, ApiError> {
  let request = state.orchestrator.validate(&body.to_request(state.config.generation.default_question_count)?)?;
  ensure_quota(&state.ai_limiter, headers).await?;
  let user = user_id(headers);
  let quiz_type = request.quiz_type.unwrap_or(QuizType::MultipleChoice);
  let generation = state.orchestrator.generate(&request).await?;

  let questions = match generation.output {
    GenerationOutput::Quiz(qs) => qs,
    GenerationOutput::Summary(_) => return Err(ApiError::Internal("quiz request produced a summary".into())),
  };
  info!(target: "generation", source = %generation.source, attempts = generation.attempts.len(), count = questions.len(), "Quiz ready");

  if let Some(user) = user {
    let title = derive_title(body.title.as_deref(), &request.source_text, "Quiz");
    spawn_save_quiz(state.store.clone(), user, title, request.source_text.clone(), quiz_type, questions.clone());
  }

  Ok(QuizOut {
    total_questions: questions.len(),
    questions,
    quiz_type,
    source: generation.source.to_string(),
    generated_at: Utc::now(),
  })
}

#[instrument(level = "info", skip(state, headers, body))]
pub async fn generate_summary(state: &AppState, headers: &HeaderMap, body: SummaryIn) -> Result<SummaryOut, ApiError> {
  let request = state.orchestrator.validate(&body.to_request()?)?;
  ensure_quota(&state.ai_limiter, headers).await?;
  let user = user_id(headers);
  let generation = state.orchestrator.generate(&request).await?;

  let result = match generation.output {
    GenerationOutput::Summary(s) => s,
    GenerationOutput::Quiz(_) => return Err(ApiError::Internal("summary request produced a quiz".into())),
  };
  info!(target: "generation", source = %generation.source, attempts = generation.attempts.len(), key_points = result.key_points.len(), "Summary ready");

  let original_length = request.source_text.chars().count();
  let summary_length = result.summary.chars().count();

  if let Some(user) = user {
    let title = derive_title(body.title.as_deref(), &request.source_text, "Summary");
    spawn_save_summary(state.store.clone(), user, title, request.source_text.clone(), result.clone());
  }

  Ok(SummaryOut {
    summary: result.summary,
    key_points: result.key_points,
    original_length,
    summary_length,
    compression_ratio: compression_ratio(summary_length, original_length),
    source: generation.source.to_string(),
    generated_at: Utc::now(),
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use axum::http::HeaderValue;

  #[test]
  fn client_key_prefers_user_then_forwarded_for() {
    let mut h = HeaderMap::new();
    assert_eq!(client_key(&h), "anonymous");

    h.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
    assert_eq!(client_key(&h), "203.0.113.7");

    h.insert(USER_HEADER, HeaderValue::from_static("user-42"));
    assert_eq!(client_key(&h), "user-42");
    assert_eq!(user_id(&h).as_deref(), Some("user-42"));
  }

  #[test]
  fn blank_user_header_is_ignored() {
    let mut h = HeaderMap::new();
    h.insert(USER_HEADER, HeaderValue::from_static("  "));
    assert_eq!(user_id(&h), None);
  }
}
