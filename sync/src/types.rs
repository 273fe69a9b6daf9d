use std::time::Duration;

/// Tunables for a sync run: batch size, inter-batch throttle, the daemon's active hardfork
/// version (governs whether unencrypted payment IDs are trusted, per [`monero_wallet::Scanner`]),
/// and the auto-retry policy applied when a batch fails.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct SyncConfig {
  /// How many blocks to fetch and scan per batch before re-polling the daemon's tip.
  pub batch_size: u64,
  /// How long to sleep between batches.
  pub batch_delay: Duration,
  /// Whether a batch failure should trigger automatic retry (`Error` -> `Syncing`) rather than
  /// surfacing the error to the caller immediately.
  pub auto_retry: bool,
  /// The maximum number of consecutive failed attempts `auto_retry` will absorb before giving up.
  pub max_retry_attempts: usize,
  /// The fixed delay between retry attempts.
  pub retry_delay: Duration,
  /// The daemon's active hardfork version, passed through to the scanner.
  pub hardfork_version: u64,
}

impl Default for SyncConfig {
  fn default() -> Self {
    Self {
      batch_size: 100,
      batch_delay: Duration::from_millis(250),
      auto_retry: false,
      max_retry_attempts: 5,
      retry_delay: Duration::from_secs(5),
      hardfork_version: 16,
    }
  }
}

/// The sync manager's current state.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SyncState {
  /// Not running. The initial state, and the state `stop()` returns to.
  Idle,
  /// Actively fetching and scanning blocks, having last confirmed `height`.
  Syncing {
    /// The last height fully processed (or the height sync resumed from, if none yet this run).
    height: u64,
  },
  /// Caught up to the daemon's tip as of `height`.
  Synced {
    /// The height sync caught up through.
    height: u64,
  },
  /// The last attempt failed. `attempts` counts consecutive failures since the last success.
  Error {
    /// The number of consecutive failed attempts so far.
    attempts: usize,
  },
}

/// An event the sync manager emits as it runs. See [`crate::SyncManager::subscribe`].
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum SyncEvent {
  /// A block finished processing.
  Progress {
    /// The height just processed.
    height: u64,
    /// The daemon's tip as last observed.
    tip: u64,
  },
  /// Sync caught up to the daemon's tip.
  Synced {
    /// The height sync caught up through.
    height: u64,
  },
  /// A reorg was detected and resolved by rolling storage back to the fork point.
  ReorgDetected {
    /// The first height that diverged from what was previously synced.
    fork_point: u64,
    /// The height sync had previously believed was confirmed.
    prior_height: u64,
  },
  /// A sync attempt failed.
  Error {
    /// The error's display text.
    message: String,
  },
}

/// An error encountered while syncing.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
  /// A daemon RPC call failed.
  #[error(transparent)]
  Rpc(#[from] monero_wallet_rpc::RpcError),
  /// A storage operation failed.
  #[error(transparent)]
  Storage(#[from] monero_wallet_storage::StorageError),
  /// Scanning a transaction failed.
  #[error(transparent)]
  Scan(#[from] monero_wallet::ScanError),
  /// A transaction the daemon returned didn't parse as a well-formed Monero transaction.
  #[error("malformed transaction: {0}")]
  MalformedTransaction(std::io::Error),
}
