use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::RpcError;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum State {
  Closed,
  Open,
  HalfOpen,
}

struct Inner {
  state: State,
  consecutive_failures: usize,
  opened_at: Option<Instant>,
}

/// A circuit breaker guarding calls to a single daemon connection.
///
/// Closed: calls pass through normally. After `failure_threshold` consecutive failures, the
/// breaker opens. Open: calls are rejected immediately with [`RpcError::CircuitOpen`] until
/// `cooldown` elapses. Half-open: the next call is allowed through as a probe; success closes the
/// breaker, failure re-opens it.
pub struct CircuitBreaker {
  failure_threshold: usize,
  cooldown: Duration,
  inner: Mutex<Inner>,
}

impl CircuitBreaker {
  /// Build a circuit breaker that opens after `failure_threshold` consecutive failures and stays
  /// open for `cooldown` before allowing a probe call.
  pub fn new(failure_threshold: usize, cooldown: Duration) -> Self {
    Self {
      failure_threshold,
      cooldown,
      inner: Mutex::new(Inner { state: State::Closed, consecutive_failures: 0, opened_at: None }),
    }
  }

  /// Whether a call should be attempted right now, transitioning Open to HalfOpen if the cooldown
  /// has elapsed.
  fn allow(&self) -> bool {
    let mut inner = self.inner.lock().expect("circuit breaker mutex poisoned");
    match inner.state {
      State::Closed | State::HalfOpen => true,
      State::Open => {
        let elapsed = inner.opened_at.map(|at| at.elapsed()).unwrap_or(Duration::MAX);
        if elapsed >= self.cooldown {
          inner.state = State::HalfOpen;
          tracing::debug!("circuit breaker cooldown elapsed, probing with a half-open call");
          true
        } else {
          false
        }
      }
    }
  }

  fn record_success(&self) {
    let mut inner = self.inner.lock().expect("circuit breaker mutex poisoned");
    inner.state = State::Closed;
    inner.consecutive_failures = 0;
    inner.opened_at = None;
  }

  fn record_failure(&self) {
    let mut inner = self.inner.lock().expect("circuit breaker mutex poisoned");
    match inner.state {
      State::HalfOpen => {
        inner.state = State::Open;
        inner.opened_at = Some(Instant::now());
        tracing::warn!("half-open probe failed, circuit breaker re-opened");
      }
      State::Closed => {
        inner.consecutive_failures += 1;
        if inner.consecutive_failures >= self.failure_threshold {
          inner.state = State::Open;
          inner.opened_at = Some(Instant::now());
          tracing::warn!(
            consecutive_failures = inner.consecutive_failures,
            "circuit breaker opened after consecutive failures"
          );
        }
      }
      State::Open => {}
    }
  }

  /// Run `call` if the breaker allows it, recording the outcome.
  pub async fn call<T, F, Fut>(&self, call: F) -> Result<T, RpcError>
  where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<T, RpcError>>,
  {
    if !self.allow() {
      return Err(RpcError::CircuitOpen);
    }
    match call().await {
      Ok(value) => {
        self.record_success();
        Ok(value)
      }
      Err(e) => {
        self.record_failure();
        Err(e)
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn opens_after_threshold_failures_and_rejects_calls() {
    let breaker = CircuitBreaker::new(2, Duration::from_secs(60));
    for _ in 0 .. 2 {
      let _ = breaker.call(|| async { Err::<(), _>(RpcError::ConnectionError("down".into())) }).await;
    }
    let result = breaker.call(|| async { Ok::<_, RpcError>(()) }).await;
    assert_eq!(result, Err(RpcError::CircuitOpen));
  }

  #[tokio::test]
  async fn success_resets_the_failure_count() {
    let breaker = CircuitBreaker::new(2, Duration::from_secs(60));
    let _ = breaker.call(|| async { Err::<(), _>(RpcError::ConnectionError("down".into())) }).await;
    let _ = breaker.call(|| async { Ok::<_, RpcError>(()) }).await;
    let _ = breaker.call(|| async { Err::<(), _>(RpcError::ConnectionError("down".into())) }).await;
    // Only one consecutive failure since the reset, below the threshold of 2.
    let result = breaker.call(|| async { Ok::<_, RpcError>(()) }).await;
    assert!(result.is_ok());
  }
}
