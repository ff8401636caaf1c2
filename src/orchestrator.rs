//! Generation orchestrator: validate, walk the provider chain, fall back.
//!
//! Providers are awaited one at a time in chain order. The first response
//! that normalizes cleanly wins; every failure is recorded and logged, then
//! the next provider is tried. When the chain is exhausted (or the overall
//! deadline passes) the canned payload from `seeds` is returned, so a valid
//! request always gets a well-formed result.

use std::time::Duration;

use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, instrument, warn};

use crate::config::{AppConfig, Prompts};
use crate::domain::{
  Generation, GenerationOutput, GenerationRequest, GenerationSource, OutputKind, ProviderAttemptRecord,
};
use crate::error::ValidationError;
use crate::providers::ProviderChain;
use crate::seeds::fallback_output;
use crate::util::trunc_for_log;

/// Stand-in deadline when the configured one does not fit in an `Instant`.
const MAX_REQUEST_DEADLINE: Duration = Duration::from_secs(24 * 60 * 60);

/// Knobs the orchestrator needs; a slice of `AppConfig`.
#[derive(Clone, Debug)]
pub struct GenerationSettings {
  pub prompts: Prompts,
  pub language: String,
  pub min_summary_chars: usize,
  pub min_question_count: usize,
  pub max_question_count: usize,
  pub max_key_points: usize,
  pub request_deadline: Duration,
}

impl GenerationSettings {
  pub fn from_config(cfg: &AppConfig) -> Self {
    let g = &cfg.generation;
    Self {
      prompts: cfg.prompts.clone(),
      language: g.language.clone(),
      min_summary_chars: g.min_summary_chars,
      min_question_count: g.min_question_count,
      max_question_count: g.max_question_count.max(g.min_question_count),
      max_key_points: g.max_key_points,
      request_deadline: g.request_deadline(),
    }
  }
}

impl Default for GenerationSettings {
  fn default() -> Self {
    Self::from_config(&AppConfig::default())
  }
}

pub struct Orchestrator {
  chain: ProviderChain,
  settings: GenerationSettings,
}

impl Orchestrator {
  pub fn new(chain: ProviderChain, settings: GenerationSettings) -> Self {
    Self { chain, settings }
  }

  pub fn provider_names(&self) -> Vec<String> {
    self.chain.names()
  }

  /// Check the request and return a copy with the question count clamped.
  pub fn validate(&self, request: &GenerationRequest) -> Result<GenerationRequest, ValidationError> {
    let text = request.source_text.trim();
    if text.is_empty() {
      return Err(ValidationError::EmptyText);
    }
    let mut checked = request.clone();
    match request.output_kind {
      OutputKind::Summary => {
        let actual = text.chars().count();
        if actual < self.settings.min_summary_chars {
          return Err(ValidationError::TextTooShort { min: self.settings.min_summary_chars, actual });
        }
      }
      OutputKind::Quiz => {
        if request.quiz_type.is_none() {
          return Err(ValidationError::MissingQuizType);
        }
        checked.question_count = request
          .question_count
          .clamp(self.settings.min_question_count, self.settings.max_question_count);
      }
    }
    Ok(checked)
  }

  /// Run one generation. Only bad input is an error; provider failures end
  /// in the fallback payload.
  #[instrument(level = "info", skip(self, request), fields(kind = ?request.output_kind, text_len = request.source_text.len()))]
  pub async fn generate(&self, request: &GenerationRequest) -> Result<Generation, ValidationError> {
    let request = self.validate(request)?;
    let now = Instant::now();
    let deadline = now
      .checked_add(self.settings.request_deadline)
      .unwrap_or_else(|| now + MAX_REQUEST_DEADLINE);
    let mut attempts: Vec<ProviderAttemptRecord> = Vec::with_capacity(self.chain.len());

    for provider in self.chain.iter() {
      let name = provider.name().to_string();
      let started = Instant::now();
      let prompt = provider.build_prompt(&self.settings.prompts, &self.settings.language, &request);
      debug!(target: "generation", provider = %name, prompt_len = prompt.user.len(), "Trying provider");

      let outcome = match timeout_at(deadline, provider.invoke(&prompt, request.output_kind)).await {
        Err(_) => {
          let reason = "abandoned: request deadline exceeded".to_string();
          record(&mut attempts, &name, Some(reason), started);
          warn!(target: "generation", provider = %name, "Request deadline exceeded; using fallback");
          return Ok(fallback(&request, attempts));
        }
        Ok(Err(e)) => Err(e),
        Ok(Ok(raw)) => {
          let normalized = provider.normalize(&raw, &request, self.settings.max_key_points);
          if normalized.is_err() {
            debug!(target: "generation", provider = %name, raw = %trunc_for_log(&raw, 300), "Unusable response");
          }
          normalized
        }
      };

      match outcome {
        Ok(output) => {
          record(&mut attempts, &name, None, started);
          return Ok(Generation { output, attempts, source: GenerationSource::Provider(name) });
        }
        Err(e) => record(&mut attempts, &name, Some(e.to_string()), started),
      }
    }

    warn!(target: "generation", tried = attempts.len(), "All providers failed; using fallback");
    Ok(fallback(&request, attempts))
  }
}

fn record(attempts: &mut Vec<ProviderAttemptRecord>, provider: &str, error: Option<String>, started: Instant) {
  let elapsed_ms = started.elapsed().as_millis() as u64;
  let succeeded = error.is_none();
  match &error {
    None => info!(target: "generation", %provider, succeeded, elapsed_ms, "Provider attempt"),
    Some(e) => warn!(target: "generation", %provider, succeeded, error = %e, elapsed_ms, "Provider attempt"),
  }
  attempts.push(ProviderAttemptRecord { provider: provider.to_string(), succeeded, error });
}

fn fallback(request: &GenerationRequest, attempts: Vec<ProviderAttemptRecord>) -> Generation {
  let output: GenerationOutput = fallback_output(request);
  Generation { output, attempts, source: GenerationSource::Fallback }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
  };

  use async_trait::async_trait;

  use crate::domain::QuizType;
  use crate::error::ProviderError;
  use crate::providers::{Prompt, Provider};

  /// Replies with a fixed body (or a 500) after an optional delay.
  struct Scripted {
    name: &'static str,
    reply: Option<&'static str>,
    delay: Duration,
    calls: Arc<AtomicUsize>,
  }

  impl Scripted {
    fn new(name: &'static str, reply: Option<&'static str>) -> Self {
      Self { name, reply, delay: Duration::ZERO, calls: Arc::new(AtomicUsize::new(0)) }
    }
  }

  #[async_trait]
  impl Provider for Scripted {
    fn name(&self) -> &str {
      self.name
    }

    fn max_input_chars(&self) -> usize {
      4000
    }

    async fn invoke(&self, _prompt: &Prompt, _kind: OutputKind) -> Result<String, ProviderError> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      if !self.delay.is_zero() {
        tokio::time::sleep(self.delay).await;
      }
      match self.reply {
        Some(body) => Ok(body.to_string()),
        None => Err(ProviderError::Status { status: 500, message: "boom".into() }),
      }
    }
  }

  const SUMMARY_OK: &str = r#"{"summary":"from C","keyPoints":["one","two"]}"#;
  const LONG_TEXT: &str = "Photosynthesis converts light energy into chemical energy stored in glucose molecules.";

  fn orchestrator(providers: Vec<Arc<dyn Provider>>) -> Orchestrator {
    Orchestrator::new(ProviderChain::new(providers), GenerationSettings::default())
  }

  #[tokio::test]
  async fn providers_are_tried_in_order_until_one_succeeds() {
    let c = Arc::new(Scripted::new("c", Some(SUMMARY_OK)));
    let orch = orchestrator(vec![
      Arc::new(Scripted::new("a", None)),
      Arc::new(Scripted::new("b", Some("I cannot help with that."))),
      c.clone(),
    ]);

    let gen = orch.generate(&GenerationRequest::summary(LONG_TEXT)).await.expect("valid request");
    let names: Vec<_> = gen.attempts.iter().map(|a| (a.provider.as_str(), a.succeeded)).collect();
    assert_eq!(names, vec![("a", false), ("b", false), ("c", true)]);
    assert_eq!(gen.source, GenerationSource::Provider("c".into()));
    match gen.output {
      GenerationOutput::Summary(s) => assert_eq!(s.summary, "from C"),
      other => panic!("expected summary, got {other:?}"),
    }
    assert_eq!(c.calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn later_providers_are_not_called_after_success() {
    let second = Arc::new(Scripted::new("second", Some(SUMMARY_OK)));
    let orch = orchestrator(vec![Arc::new(Scripted::new("first", Some(SUMMARY_OK))), second.clone()]);
    let gen = orch.generate(&GenerationRequest::summary(LONG_TEXT)).await.unwrap();
    assert_eq!(gen.attempts.len(), 1);
    assert_eq!(second.calls.load(Ordering::SeqCst), 0);
  }

  #[tokio::test]
  async fn exhausted_chain_returns_fallback_for_each_kind() {
    let orch = orchestrator(vec![Arc::new(Scripted::new("a", None))]);

    let mc = orch.generate(&GenerationRequest::quiz(LONG_TEXT, QuizType::MultipleChoice, 4)).await.unwrap();
    assert_eq!(mc.source, GenerationSource::Fallback);
    match mc.output {
      GenerationOutput::Quiz(qs) => {
        assert_eq!(qs.len(), 4);
        assert!(qs.iter().all(|q| q.options.as_ref().is_some_and(|o| o.contains(&q.correct_answer))));
      }
      other => panic!("expected quiz, got {other:?}"),
    }

    let essay = orch.generate(&GenerationRequest::quiz(LONG_TEXT, QuizType::Essay, 3)).await.unwrap();
    assert!(matches!(essay.output, GenerationOutput::Quiz(ref qs) if qs.iter().all(|q| q.kind == QuizType::Essay)));

    let summary = orch.generate(&GenerationRequest::summary(LONG_TEXT)).await.unwrap();
    assert!(matches!(summary.output, GenerationOutput::Summary(ref s) if !s.key_points.is_empty()));
  }

  #[tokio::test]
  async fn empty_chain_still_answers() {
    let gen = orchestrator(vec![]).generate(&GenerationRequest::summary(LONG_TEXT)).await.unwrap();
    assert!(gen.attempts.is_empty());
    assert_eq!(gen.source, GenerationSource::Fallback);
  }

  #[tokio::test]
  async fn short_summary_fails_validation_without_calls() {
    let a = Arc::new(Scripted::new("a", Some(SUMMARY_OK)));
    let orch = orchestrator(vec![a.clone()]);
    let err = orch.generate(&GenerationRequest::summary("too short")).await.unwrap_err();
    assert_eq!(err, ValidationError::TextTooShort { min: 50, actual: 9 });
    assert_eq!(a.calls.load(Ordering::SeqCst), 0);

    let blank = orch.generate(&GenerationRequest::quiz("   ", QuizType::Essay, 5)).await.unwrap_err();
    assert_eq!(blank, ValidationError::EmptyText);
  }

  #[tokio::test]
  async fn quiz_without_type_is_rejected() {
    let mut req = GenerationRequest::quiz(LONG_TEXT, QuizType::Essay, 5);
    req.quiz_type = None;
    assert_eq!(orchestrator(vec![]).generate(&req).await.unwrap_err(), ValidationError::MissingQuizType);
  }

  #[tokio::test]
  async fn answer_missing_from_options_falls_through() {
    let bad = r#"{"questions":[{"question":"Q?","options":["a","b","c","d"],"correctAnswer":"e"}]}"#;
    let good = r#"{"questions":[{"question":"Q?","options":["a","b","c","d"],"correctAnswer":"d"}]}"#;
    let orch = orchestrator(vec![Arc::new(Scripted::new("bad", Some(bad))), Arc::new(Scripted::new("good", Some(good)))]);
    let gen = orch.generate(&GenerationRequest::quiz(LONG_TEXT, QuizType::MultipleChoice, 3)).await.unwrap();
    assert!(!gen.attempts[0].succeeded);
    assert!(gen.attempts[0].error.as_deref().is_some_and(|e| e.contains("not one of the options")));
    assert_eq!(gen.source, GenerationSource::Provider("good".into()));
  }

  #[test]
  fn question_count_is_clamped() {
    let orch = orchestrator(vec![]);
    let low = orch.validate(&GenerationRequest::quiz(LONG_TEXT, QuizType::Essay, 1)).unwrap();
    let high = orch.validate(&GenerationRequest::quiz(LONG_TEXT, QuizType::Essay, 40)).unwrap();
    assert_eq!((low.question_count, high.question_count), (3, 10));
  }

  #[tokio::test(start_paused = true)]
  async fn deadline_abandons_slow_provider() {
    let mut slow = Scripted::new("slow", Some(SUMMARY_OK));
    slow.delay = Duration::from_secs(60);
    let next = Arc::new(Scripted::new("next", Some(SUMMARY_OK)));
    let settings = GenerationSettings { request_deadline: Duration::from_secs(5), ..GenerationSettings::default() };
    let orch = Orchestrator::new(ProviderChain::new(vec![Arc::new(slow), next.clone()]), settings);

    let gen = orch.generate(&GenerationRequest::summary(LONG_TEXT)).await.unwrap();
    assert_eq!(gen.source, GenerationSource::Fallback);
    assert_eq!(gen.attempts.len(), 1);
    assert!(gen.attempts[0].error.as_deref().is_some_and(|e| e.contains("deadline")));
    assert_eq!(next.calls.load(Ordering::SeqCst), 0);
  }

  #[tokio::test]
  async fn oversized_deadline_does_not_overflow() {
    let settings = GenerationSettings { request_deadline: Duration::MAX, ..GenerationSettings::default() };
    let good: Arc<dyn Provider> = Arc::new(Scripted::new("good", Some(SUMMARY_OK)));
    let orch = Orchestrator::new(ProviderChain::new(vec![good]), settings);

    let gen = orch.generate(&GenerationRequest::summary(LONG_TEXT)).await.unwrap();
    assert_eq!(gen.source, GenerationSource::Provider("good".into()));
  }
}
