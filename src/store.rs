//! History persistence: source documents, generated quizzes and summaries.
//!
//! Records belong to the user that created them; asking for someone else's
//! record is indistinguishable from asking for a missing one. Writes from the
//! request path go through `spawn_*` helpers and never block or fail a
//! response.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::domain::{QuizQuestion, QuizType, SummaryResult};
use crate::error::StoreError;

pub const HISTORY_LIMIT: usize = 50;

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
  pub id: String,
  #[serde(skip)]
  pub user_id: String,
  pub title: String,
  pub content: String,
  pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizRecord {
  pub id: String,
  #[serde(skip)]
  pub seq: u64,
  #[serde(skip)]
  pub user_id: String,
  pub document_id: String,
  pub title: String,
  #[serde(rename = "type")]
  pub quiz_type: QuizType,
  pub questions: Vec<QuizQuestion>,
  pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryRecord {
  pub id: String,
  #[serde(skip)]
  pub seq: u64,
  #[serde(skip)]
  pub user_id: String,
  pub document_id: String,
  pub title: String,
  #[serde(flatten)]
  pub result: SummaryResult,
  pub created_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryKind {
  Quiz,
  Summary,
}

/// Payload shown for a history row without a detail request.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum HistoryContent {
  Quiz {
    questions: Vec<QuizQuestion>,
    #[serde(rename = "documentTitle")]
    document_title: Option<String>,
  },
  Summary {
    content: String,
    #[serde(rename = "documentTitle")]
    document_title: Option<String>,
  },
}

/// One row of the history sidebar.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
  pub id: String,
  #[serde(rename = "type")]
  pub kind: HistoryKind,
  pub title: String,
  pub document_title: Option<String>,
  pub content: HistoryContent,
  pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait HistoryStore: Send + Sync {
  async fn save_document(&self, user_id: &str, title: &str, content: &str) -> Result<DocumentRecord, StoreError>;

  async fn save_quiz(
    &self,
    user_id: &str,
    document_id: &str,
    title: &str,
    quiz_type: QuizType,
    questions: Vec<QuizQuestion>,
  ) -> Result<QuizRecord, StoreError>;

  async fn save_summary(
    &self,
    user_id: &str,
    document_id: &str,
    title: &str,
    result: SummaryResult,
  ) -> Result<SummaryRecord, StoreError>;

  /// Newest first; at most `limit` quizzes and `limit` summaries.
  async fn list_history(&self, user_id: &str, limit: usize) -> Result<Vec<HistoryEntry>, StoreError>;

  async fn get_quiz(&self, user_id: &str, id: &str) -> Result<(QuizRecord, Option<DocumentRecord>), StoreError>;
  async fn get_summary(&self, user_id: &str, id: &str) -> Result<(SummaryRecord, Option<DocumentRecord>), StoreError>;
  async fn delete_quiz(&self, user_id: &str, id: &str) -> Result<(), StoreError>;
  async fn delete_summary(&self, user_id: &str, id: &str) -> Result<(), StoreError>;
}

#[derive(Default)]
struct Inner {
  documents: HashMap<String, DocumentRecord>,
  quizzes: Vec<QuizRecord>,
  summaries: Vec<SummaryRecord>,
  // Store-wide insertion counter; orders history without trusting the clock.
  next_seq: u64,
}

impl Inner {
  fn seq(&mut self) -> u64 {
    self.next_seq += 1;
    self.next_seq
  }
}

/// Process-local store. Contents are lost on restart.
#[derive(Default)]
pub struct MemoryStore {
  inner: RwLock<Inner>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }
}

fn new_id() -> String {
  Uuid::new_v4().to_string()
}

#[async_trait]
impl HistoryStore for MemoryStore {
  async fn save_document(&self, user_id: &str, title: &str, content: &str) -> Result<DocumentRecord, StoreError> {
    let rec = DocumentRecord {
      id: new_id(),
      user_id: user_id.to_string(),
      title: title.to_string(),
      content: content.to_string(),
      created_at: Utc::now(),
    };
    self.inner.write().await.documents.insert(rec.id.clone(), rec.clone());
    Ok(rec)
  }

  async fn save_quiz(
    &self,
    user_id: &str,
    document_id: &str,
    title: &str,
    quiz_type: QuizType,
    questions: Vec<QuizQuestion>,
  ) -> Result<QuizRecord, StoreError> {
    let mut inner = self.inner.write().await;
    let rec = QuizRecord {
      id: new_id(),
      seq: inner.seq(),
      user_id: user_id.to_string(),
      document_id: document_id.to_string(),
      title: title.to_string(),
      quiz_type,
      questions,
      created_at: Utc::now(),
    };
    inner.quizzes.push(rec.clone());
    Ok(rec)
  }

  async fn save_summary(
    &self,
    user_id: &str,
    document_id: &str,
    title: &str,
    result: SummaryResult,
  ) -> Result<SummaryRecord, StoreError> {
    let mut inner = self.inner.write().await;
    let rec = SummaryRecord {
      id: new_id(),
      seq: inner.seq(),
      user_id: user_id.to_string(),
      document_id: document_id.to_string(),
      title: title.to_string(),
      result,
      created_at: Utc::now(),
    };
    inner.summaries.push(rec.clone());
    Ok(rec)
  }

  async fn list_history(&self, user_id: &str, limit: usize) -> Result<Vec<HistoryEntry>, StoreError> {
    let inner = self.inner.read().await;
    let doc_title = |id: &str| inner.documents.get(id).map(|d| d.title.clone());

    let mut rows: Vec<(u64, HistoryEntry)> = Vec::new();
    let quizzes = inner.quizzes.iter().rev().filter(|q| q.user_id == user_id).take(limit);
    for q in quizzes {
      rows.push((
        q.seq,
        HistoryEntry {
          id: q.id.clone(),
          kind: HistoryKind::Quiz,
          title: q.title.clone(),
          document_title: doc_title(&q.document_id),
          content: HistoryContent::Quiz { questions: q.questions.clone(), document_title: doc_title(&q.document_id) },
          created_at: q.created_at,
        },
      ));
    }
    let summaries = inner.summaries.iter().rev().filter(|s| s.user_id == user_id).take(limit);
    for s in summaries {
      rows.push((
        s.seq,
        HistoryEntry {
          id: s.id.clone(),
          kind: HistoryKind::Summary,
          title: s.title.clone(),
          document_title: doc_title(&s.document_id),
          content: HistoryContent::Summary {
            content: s.result.summary.clone(),
            document_title: doc_title(&s.document_id),
          },
          created_at: s.created_at,
        },
      ));
    }
    rows.sort_by(|a, b| b.0.cmp(&a.0));
    Ok(rows.into_iter().map(|(_, e)| e).collect())
  }

  async fn get_quiz(&self, user_id: &str, id: &str) -> Result<(QuizRecord, Option<DocumentRecord>), StoreError> {
    let inner = self.inner.read().await;
    let quiz = inner
      .quizzes
      .iter()
      .find(|q| q.id == id && q.user_id == user_id)
      .cloned()
      .ok_or(StoreError::NotFound)?;
    let doc = inner.documents.get(&quiz.document_id).cloned();
    Ok((quiz, doc))
  }

  async fn get_summary(&self, user_id: &str, id: &str) -> Result<(SummaryRecord, Option<DocumentRecord>), StoreError> {
    let inner = self.inner.read().await;
    let summary = inner
      .summaries
      .iter()
      .find(|s| s.id == id && s.user_id == user_id)
      .cloned()
      .ok_or(StoreError::NotFound)?;
    let doc = inner.documents.get(&summary.document_id).cloned();
    Ok((summary, doc))
  }

  async fn delete_quiz(&self, user_id: &str, id: &str) -> Result<(), StoreError> {
    let mut inner = self.inner.write().await;
    let before = inner.quizzes.len();
    inner.quizzes.retain(|q| !(q.id == id && q.user_id == user_id));
    if inner.quizzes.len() == before {
      return Err(StoreError::NotFound);
    }
    Ok(())
  }

  async fn delete_summary(&self, user_id: &str, id: &str) -> Result<(), StoreError> {
    let mut inner = self.inner.write().await;
    let before = inner.summaries.len();
    inner.summaries.retain(|s| !(s.id == id && s.user_id == user_id));
    if inner.summaries.len() == before {
      return Err(StoreError::NotFound);
    }
    Ok(())
  }
}

/// Save the source document and the quiz in the background.
#[instrument(level = "debug", skip(store, content, questions), fields(content_len = content.len(), count = questions.len()))]
pub fn spawn_save_quiz(
  store: Arc<dyn HistoryStore>,
  user_id: String,
  title: String,
  content: String,
  quiz_type: QuizType,
  questions: Vec<QuizQuestion>,
) {
  tokio::spawn(async move {
    let result: Result<QuizRecord, StoreError> = async {
      let doc = store.save_document(&user_id, &title, &content).await?;
      store.save_quiz(&user_id, &doc.id, &title, quiz_type, questions).await
    }
    .await;
    match result {
      Ok(rec) => info!(target: "history", id = %rec.id, %user_id, "Quiz saved"),
      Err(e) => error!(target: "history", %user_id, error = %e, "Saving quiz failed"),
    }
  });
}

/// Save the source document and the summary in the background.
#[instrument(level = "debug", skip(store, content, result), fields(content_len = content.len()))]
pub fn spawn_save_summary(
  store: Arc<dyn HistoryStore>,
  user_id: String,
  title: String,
  content: String,
  result: SummaryResult,
) {
  tokio::spawn(async move {
    let saved: Result<SummaryRecord, StoreError> = async {
      let doc = store.save_document(&user_id, &title, &content).await?;
      store.save_summary(&user_id, &doc.id, &title, result).await
    }
    .await;
    match saved {
      Ok(rec) => info!(target: "history", id = %rec.id, %user_id, "Summary saved"),
      Err(e) => error!(target: "history", %user_id, error = %e, "Saving summary failed"),
    }
  });
}

#[cfg(test)]
mod tests {
  use super::*;

  fn summary(text: &str) -> SummaryResult {
    SummaryResult { summary: text.into(), key_points: vec!["k".into()] }
  }

  fn essay(q: &str) -> Vec<QuizQuestion> {
    vec![QuizQuestion { question: q.into(), options: None, correct_answer: "a".into(), kind: QuizType::Essay }]
  }

  #[tokio::test]
  async fn history_is_newest_first_and_per_user() {
    let store = MemoryStore::new();
    let doc = store.save_document("u1", "Biology", "cells...").await.unwrap();
    store.save_quiz("u1", &doc.id, "Quiz 1", QuizType::Essay, essay("1?")).await.unwrap();
    store.save_summary("u1", &doc.id, "Summary 1", summary("s")).await.unwrap();
    store.save_quiz("u1", &doc.id, "Quiz 2", QuizType::Essay, essay("2?")).await.unwrap();
    store.save_quiz("u2", &doc.id, "Other", QuizType::Essay, essay("x?")).await.unwrap();

    let history = store.list_history("u1", HISTORY_LIMIT).await.unwrap();
    let titles: Vec<_> = history.iter().map(|h| h.title.as_str()).collect();
    assert_eq!(titles, vec!["Quiz 2", "Summary 1", "Quiz 1"]);
    assert_eq!(history[0].document_title.as_deref(), Some("Biology"));
  }

  #[tokio::test]
  async fn history_rows_carry_their_content() {
    let store = MemoryStore::new();
    let doc = store.save_document("u", "Biology", "cells...").await.unwrap();
    store.save_quiz("u", &doc.id, "Q", QuizType::Essay, essay("Why ATP?")).await.unwrap();
    store.save_summary("u", &doc.id, "S", summary("Cells make ATP.")).await.unwrap();

    let history = store.list_history("u", HISTORY_LIMIT).await.unwrap();
    assert_eq!(
      history[0].content,
      HistoryContent::Summary { content: "Cells make ATP.".into(), document_title: Some("Biology".into()) }
    );
    let json = serde_json::to_value(&history[1]).unwrap();
    assert_eq!(json["content"]["questions"][0]["question"], "Why ATP?");
    assert_eq!(json["content"]["documentTitle"], "Biology");
    assert_eq!(json["type"], "quiz");
  }

  #[tokio::test]
  async fn history_limit_applies_per_kind() {
    let store = MemoryStore::new();
    for i in 0..4 {
      store.save_quiz("u", "d", &format!("q{i}"), QuizType::Essay, essay("?")).await.unwrap();
    }
    store.save_summary("u", "d", "s0", summary("s")).await.unwrap();
    let history = store.list_history("u", 2).await.unwrap();
    let titles: Vec<_> = history.iter().map(|h| h.title.as_str()).collect();
    assert_eq!(titles, vec!["s0", "q3", "q2"]);
  }

  #[tokio::test]
  async fn other_users_records_are_not_found() {
    let store = MemoryStore::new();
    let doc = store.save_document("owner", "Doc", "text").await.unwrap();
    let quiz = store.save_quiz("owner", &doc.id, "Quiz", QuizType::Essay, essay("?")).await.unwrap();

    assert_eq!(store.get_quiz("intruder", &quiz.id).await.unwrap_err(), StoreError::NotFound);
    assert_eq!(store.delete_quiz("intruder", &quiz.id).await.unwrap_err(), StoreError::NotFound);

    let (found, doc) = store.get_quiz("owner", &quiz.id).await.unwrap();
    assert_eq!(found.title, "Quiz");
    assert_eq!(doc.map(|d| d.content), Some("text".to_string()));
    store.delete_quiz("owner", &quiz.id).await.unwrap();
    assert_eq!(store.get_quiz("owner", &quiz.id).await.unwrap_err(), StoreError::NotFound);
  }

  #[tokio::test]
  async fn summary_crud() {
    let store = MemoryStore::new();
    let rec = store.save_summary("u", "missing-doc", "S", summary("body")).await.unwrap();
    let (got, doc) = store.get_summary("u", &rec.id).await.unwrap();
    assert_eq!(got.result.summary, "body");
    assert!(doc.is_none());
    store.delete_summary("u", &rec.id).await.unwrap();
    assert!(store.delete_summary("u", &rec.id).await.is_err());
  }

  #[tokio::test]
  async fn background_save_lands_in_history() {
    let store = Arc::new(MemoryStore::new());
    spawn_save_summary(store.clone(), "u".into(), "Bg".into(), "content".into(), summary("s"));
    for _ in 0..50 {
      if !store.list_history("u", HISTORY_LIMIT).await.unwrap().is_empty() {
        break;
      }
      tokio::task::yield_now().await;
    }
    let history = store.list_history("u", HISTORY_LIMIT).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].kind, HistoryKind::Summary);
  }
}
