//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented; bodies are logged by size only.

use std::sync::Arc;

use axum::{
  extract::{Path, State},
  http::HeaderMap,
  Json,
};
use chrono::Utc;
use tracing::{info, instrument};

use crate::error::ApiError;
use crate::logic::{self, ensure_quota, user_id};
use crate::protocol::*;
use crate::state::AppState;
use crate::store::HISTORY_LIMIT;

fn require_user(headers: &HeaderMap) -> Result<String, ApiError> {
  user_id(headers).ok_or(ApiError::Unauthorized)
}

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> Json<HealthOut> {
  Json(HealthOut {
    status: "healthy",
    version: env!("CARGO_PKG_VERSION"),
    uptime_secs: state.started_at.elapsed().as_secs(),
    timestamp: Utc::now(),
    providers: state.orchestrator.provider_names(),
  })
}

#[instrument(level = "info", skip(state, headers, body), fields(file_name = %body.file_name))]
pub async fn http_post_extract_text(
  State(state): State<Arc<AppState>>,
  headers: HeaderMap,
  Json(body): Json<ExtractIn>,
) -> Result<Json<ExtractOut>, ApiError> {
  ensure_quota(&state.api_limiter, &headers).await?;
  let out = logic::extract_text(&state, body).await?;
  info!(target: "study_assistant", pages = out.num_pages, "HTTP extract-text served");
  Ok(Json(out))
}

#[instrument(level = "info", skip(state, headers, body), fields(text_len = body.text.as_deref().map_or(0, str::len)))]
pub async fn http_post_generate_quiz(
  State(state): State<Arc<AppState>>,
  headers: HeaderMap,
  Json(body): Json<QuizIn>,
) -> Result<Json<QuizOut>, ApiError> {
  let out = logic::generate_quiz(&state, &headers, body).await?;
  Ok(Json(out))
}

#[instrument(level = "info", skip(state, headers, body), fields(text_len = body.text.as_deref().map_or(0, str::len)))]
pub async fn http_post_generate_summary(
  State(state): State<Arc<AppState>>,
  headers: HeaderMap,
  Json(body): Json<SummaryIn>,
) -> Result<Json<SummaryOut>, ApiError> {
  let out = logic::generate_summary(&state, &headers, body).await?;
  Ok(Json(out))
}

#[instrument(level = "info", skip(state, headers))]
pub async fn http_get_history(
  State(state): State<Arc<AppState>>,
  headers: HeaderMap,
) -> Result<Json<HistoryOut>, ApiError> {
  let user = require_user(&headers)?;
  let history = state.store.list_history(&user, HISTORY_LIMIT).await?;
  info!(target: "history", %user, entries = history.len(), "HTTP history served");
  Ok(Json(HistoryOut { history }))
}

#[instrument(level = "info", skip(state, headers), fields(%id))]
pub async fn http_get_quiz(
  State(state): State<Arc<AppState>>,
  headers: HeaderMap,
  Path(id): Path<String>,
) -> Result<Json<QuizDetailOut>, ApiError> {
  let user = require_user(&headers)?;
  let (quiz, document) = state.store.get_quiz(&user, &id).await?;
  Ok(Json(QuizDetailOut { quiz, document: document.map(DocumentOut::from) }))
}

#[instrument(level = "info", skip(state, headers), fields(%id))]
pub async fn http_delete_quiz(
  State(state): State<Arc<AppState>>,
  headers: HeaderMap,
  Path(id): Path<String>,
) -> Result<Json<DeletedOut>, ApiError> {
  let user = require_user(&headers)?;
  state.store.delete_quiz(&user, &id).await?;
  info!(target: "history", %user, %id, "Quiz deleted");
  Ok(Json(DeletedOut { deleted: true }))
}

#[instrument(level = "info", skip(state, headers), fields(%id))]
pub async fn http_get_summary(
  State(state): State<Arc<AppState>>,
  headers: HeaderMap,
  Path(id): Path<String>,
) -> Result<Json<SummaryDetailOut>, ApiError> {
  let user = require_user(&headers)?;
  let (summary, document) = state.store.get_summary(&user, &id).await?;
  Ok(Json(SummaryDetailOut { summary, document: document.map(DocumentOut::from) }))
}

#[instrument(level = "info", skip(state, headers), fields(%id))]
pub async fn http_delete_summary(
  State(state): State<Arc<AppState>>,
  headers: HeaderMap,
  Path(id): Path<String>,
) -> Result<Json<DeletedOut>, ApiError> {
  let user = require_user(&headers)?;
  state.store.delete_summary(&user, &id).await?;
  info!(target: "history", %user, %id, "Summary deleted");
  Ok(Json(DeletedOut { deleted: true }))
}
