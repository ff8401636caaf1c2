//! In-memory keyed token buckets.
//!
//! Each key starts with `points` tokens and refills continuously at
//! `points / window`. A request costs one token. Buckets that have been idle
//! long enough to be full again are dropped on the next sweep.

use std::{collections::HashMap, time::Duration};

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

struct Bucket {
  tokens: f64,
  last: Instant,
}

pub struct RateLimiter {
  name: &'static str,
  points: u32,
  window: Duration,
  buckets: Mutex<HashMap<String, Bucket>>,
}

const SWEEP_THRESHOLD: usize = 10_000;

impl RateLimiter {
  pub fn new(name: &'static str, points: u32, window: Duration) -> Self {
    Self { name, points: points.max(1), window, buckets: Mutex::new(HashMap::new()) }
  }

  fn refill_per_sec(&self) -> f64 {
    f64::from(self.points) / self.window.as_secs_f64().max(f64::EPSILON)
  }

  /// Take one token for `key`. False means the caller is over the limit.
  pub async fn consume(&self, key: &str) -> bool {
    let now = Instant::now();
    let capacity = f64::from(self.points);
    let rate = self.refill_per_sec();
    let mut buckets = self.buckets.lock().await;

    if buckets.len() > SWEEP_THRESHOLD {
      let window = self.window;
      buckets.retain(|_, b| now.duration_since(b.last) < window);
    }

    let bucket = buckets.entry(key.to_string()).or_insert(Bucket { tokens: capacity, last: now });
    let elapsed = now.duration_since(bucket.last).as_secs_f64();
    bucket.tokens = (bucket.tokens + elapsed * rate).min(capacity);
    bucket.last = now;

    if bucket.tokens >= 1.0 {
      bucket.tokens -= 1.0;
      true
    } else {
      debug!(target: "study_assistant", limiter = self.name, %key, "Rate limit exceeded");
      false
    }
  }
}
