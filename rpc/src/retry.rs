use std::time::Duration;

/// An exponential backoff schedule: a caller retries an RPC call by iterating this policy's
/// delays, sleeping for each in turn, until either the call succeeds or the schedule is exhausted.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct RetryPolicy {
  max_attempts: usize,
  base_delay: Duration,
  max_delay: Duration,
}

impl RetryPolicy {
  /// Build a retry policy: up to `max_attempts` tries total, backing off from `base_delay`,
  /// doubling each attempt, capped at `max_delay`.
  pub fn new(max_attempts: usize, base_delay: Duration, max_delay: Duration) -> Self {
    Self { max_attempts, base_delay, max_delay }
  }

  /// The maximum number of attempts this policy allows.
  pub fn max_attempts(&self) -> usize {
    self.max_attempts
  }

  /// The delay to sleep for before attempt number `attempt` (0-indexed; attempt 0 never sleeps).
  pub fn delay_for(&self, attempt: usize) -> Duration {
    if attempt == 0 {
      return Duration::ZERO;
    }
    let shift = u32::try_from(attempt - 1).unwrap_or(u32::MAX).min(32);
    self.base_delay.saturating_mul(1u32.checked_shl(shift).unwrap_or(u32::MAX)).min(self.max_delay)
  }

  /// The delays a caller should sleep between each of `max_attempts` tries.
  pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
    (0 .. self.max_attempts).map(|attempt| self.delay_for(attempt))
  }
}

impl Default for RetryPolicy {
  /// Five attempts, 200ms base delay doubling up to a 5 second cap.
  fn default() -> Self {
    Self::new(5, Duration::from_millis(200), Duration::from_secs(5))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn delays_double_and_cap() {
    let policy = RetryPolicy::new(6, Duration::from_millis(100), Duration::from_millis(1000));
    let delays: Vec<_> = policy.delays().collect();
    assert_eq!(
      delays,
      vec![
        Duration::ZERO,
        Duration::from_millis(100),
        Duration::from_millis(200),
        Duration::from_millis(400),
        Duration::from_millis(800),
        Duration::from_millis(1000),
      ]
    );
  }
}
