//! Turning free-form provider text into the fixed quiz/summary schema.
//!
//! Models wrap their JSON in code fences or a sentence of prose. We strip
//! the fences, take the first balanced `{...}` that parses, and then
//! validate the shape strictly. Anything that does not pass
//! is a `ProviderError`, which makes the orchestrator move on.

use serde::Deserialize;
use serde_json::Value;

use crate::domain::{QuizQuestion, QuizType, SummaryResult};
use crate::error::ProviderError;

pub const MULTIPLE_CHOICE_OPTIONS: usize = 4;

const FENCE: &str = "```";

/// Remove a markdown code fence wrapped around the whole response. Fences
/// inside the payload (e.g. in a string value) are left alone.
pub fn strip_wrapping(raw: &str) -> String {
  let mut out = raw.trim();
  if let Some(rest) = out.strip_prefix(FENCE) {
    // Drop the info string (`json`, `JSON`, ...) on the opening line.
    out = rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric());
  }
  if let Some(rest) = out.strip_suffix(FENCE) {
    out = rest;
  }
  out.trim().to_string()
}

/// First balanced `{...}` substring of `text` that parses as a JSON object.
pub fn first_json_object(text: &str) -> Option<Value> {
  let mut from = 0;
  while let Some(rel) = text[from..].find('{') {
    let open = from + rel;
    if let Some(close) = matching_brace(&text[open..]) {
      let candidate = &text[open..=open + close];
      if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(candidate) {
        return Some(value);
      }
    }
    from = open + 1;
  }
  None
}

/// Byte offset of the brace closing the one at position 0. String-literal aware.
fn matching_brace(s: &str) -> Option<usize> {
  let mut depth = 0usize;
  let mut in_string = false;
  let mut escaped = false;
  for (i, ch) in s.char_indices() {
    if in_string {
      if escaped {
        escaped = false;
      } else if ch == '\\' {
        escaped = true;
      } else if ch == '"' {
        in_string = false;
      }
      continue;
    }
    match ch {
      '"' => in_string = true,
      '{' => depth += 1,
      '}' => {
        depth = depth.saturating_sub(1);
        if depth == 0 {
          return Some(i);
        }
      }
      _ => {}
    }
  }
  None
}

fn json_payload(raw: &str) -> Result<Value, ProviderError> {
  if raw.trim().is_empty() {
    return Err(ProviderError::EmptyResponse);
  }
  let cleaned = strip_wrapping(raw);
  first_json_object(&cleaned).ok_or_else(|| ProviderError::Malformed("no JSON object found in response".into()))
}

#[derive(Deserialize)]
struct RawQuiz {
  questions: Vec<RawQuestion>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawQuestion {
  question: String,
  #[serde(default)]
  options: Option<Vec<String>>,
  #[serde(default, alias = "correct_answer", alias = "answer")]
  correct_answer: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSummary {
  summary: String,
  #[serde(alias = "key_points")]
  key_points: Vec<String>,
}

/// Parse and validate a quiz payload. At most `count` questions are kept.
pub fn normalize_quiz(raw: &str, quiz_type: QuizType, count: usize) -> Result<Vec<QuizQuestion>, ProviderError> {
  let value = json_payload(raw)?;
  let parsed: RawQuiz = serde_json::from_value(value).map_err(|e| ProviderError::shape(format!("quiz: {e}")))?;
  if parsed.questions.is_empty() {
    return Err(ProviderError::shape("quiz: 'questions' is empty"));
  }

  parsed
    .questions
    .into_iter()
    .take(count.max(1))
    .enumerate()
    .map(|(i, q)| validate_question(i, q, quiz_type))
    .collect()
}

fn validate_question(index: usize, q: RawQuestion, quiz_type: QuizType) -> Result<QuizQuestion, ProviderError> {
  let question = q.question.trim().to_string();
  if question.is_empty() {
    return Err(ProviderError::shape(format!("question {index}: empty text")));
  }
  let answer = q.correct_answer.map(|a| a.trim().to_string()).unwrap_or_default();
  if answer.is_empty() {
    return Err(ProviderError::shape(format!("question {index}: missing correctAnswer")));
  }

  match quiz_type {
    QuizType::MultipleChoice => {
      let options: Vec<String> = q
        .options
        .ok_or_else(|| ProviderError::shape(format!("question {index}: missing options")))?
        .into_iter()
        .map(|o| o.trim().to_string())
        .collect();
      if options.len() != MULTIPLE_CHOICE_OPTIONS {
        return Err(ProviderError::shape(format!(
          "question {index}: expected {MULTIPLE_CHOICE_OPTIONS} options, got {}",
          options.len()
        )));
      }
      if options.iter().any(|o| o.is_empty()) {
        return Err(ProviderError::shape(format!("question {index}: empty option")));
      }
      if !options.contains(&answer) {
        return Err(ProviderError::shape(format!("question {index}: correctAnswer is not one of the options")));
      }
      Ok(QuizQuestion { question, options: Some(options), correct_answer: answer, kind: QuizType::MultipleChoice })
    }
    QuizType::Essay => Ok(QuizQuestion { question, options: None, correct_answer: answer, kind: QuizType::Essay }),
  }
}

/// Parse and validate a summary payload. Key points are capped at `max_key_points`.
pub fn normalize_summary(raw: &str, max_key_points: usize) -> Result<SummaryResult, ProviderError> {
  let value = json_payload(raw)?;
  let parsed: RawSummary = serde_json::from_value(value).map_err(|e| ProviderError::shape(format!("summary: {e}")))?;

  let summary = parsed.summary.trim().to_string();
  if summary.is_empty() {
    return Err(ProviderError::shape("summary: empty 'summary'"));
  }
  let key_points: Vec<String> = parsed
    .key_points
    .into_iter()
    .map(|p| p.trim().to_string())
    .filter(|p| !p.is_empty())
    .take(max_key_points.max(1))
    .collect();
  if key_points.is_empty() {
    return Err(ProviderError::shape("summary: no key points"));
  }

  Ok(SummaryResult { summary, key_points })
}
