#![doc = "Drives batched block sync against a daemon: fetches new blocks, scans them with a view-key Scanner, persists recognized outputs and transactions, and detects and resolves reorgs."]
#![deny(missing_docs)]

mod types;

pub use types::{SyncConfig, SyncError, SyncEvent, SyncState};

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use tokio::sync::broadcast;
use tokio::time::sleep;

use monero_wallet::extra::PaymentId;
use monero_wallet::transaction::{Input, Timelock, Transaction};
use monero_wallet::Scanner;
use monero_wallet_primitives::{keccak256, Scalar};
use monero_wallet_rpc::{BlockWithTransactions, DaemonRpc, RpcError};
use monero_wallet_storage::{Direction, Storage, StoredOutput, StoredTransaction};

/// The event channel's capacity. Progress events may be dropped under backpressure (a subscriber
/// only ever needs the latest); `ReorgDetected` and completion events are small and infrequent
/// enough that this margin keeps them from being lost in practice.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Drives one wallet's sync loop: `Idle -> Syncing -> (Synced | Error)`, with `Error -> Syncing`
/// auto-retry when configured. `stop()` is callable from any state and returns to `Idle`.
///
/// A single manager owns its loop exclusively: calling [`Self::start`] while already running is a
/// no-op. The manager holds no daemon connection or storage handle itself; both are borrowed for
/// the duration of a single `start()` call, matching this workspace's dependency-injection
/// convention of passing collaborators in rather than reaching for globals.
pub struct SyncManager {
  config: SyncConfig,
  state: Mutex<SyncState>,
  running: AtomicBool,
  stop_requested: AtomicBool,
  events: broadcast::Sender<SyncEvent>,
}

impl SyncManager {
  /// Build a sync manager with the given configuration.
  pub fn new(config: SyncConfig) -> Self {
    let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
    Self {
      config,
      state: Mutex::new(SyncState::Idle),
      running: AtomicBool::new(false),
      stop_requested: AtomicBool::new(false),
      events,
    }
  }

  /// The manager's current state.
  pub fn state(&self) -> SyncState {
    *self.state.lock().expect("sync state mutex poisoned")
  }

  /// Whether a sync loop is presently running.
  pub fn is_running(&self) -> bool {
    self.running.load(Ordering::SeqCst)
  }

  /// Subscribe to sync events. A late subscriber only receives events from this point forward;
  /// unlike the storage layer's sync-height stream, there's no single "current value" to replay.
  pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
    self.events.subscribe()
  }

  /// Stop the running loop. Honored at the next suspension point: an in-flight block write
  /// completes first, so storage is never left mid-batch. Returns immediately; the manager's
  /// reported state transitions to `Idle` right away, ahead of the loop's own exit.
  pub fn stop(&self) {
    self.stop_requested.store(true, Ordering::SeqCst);
    *self.state.lock().expect("sync state mutex poisoned") = SyncState::Idle;
    tracing::info!("sync stop requested");
  }

  /// Run the sync loop to completion (caught up to the daemon's tip, stopped, or out of retries).
  ///
  /// `spend_scalar`, if given, is the wallet's full private spend scalar, needed to compute real
  /// key images for newly recognized outputs. Without it (a view-only wallet), recognized outputs
  /// are stored under a placeholder key image (`keccak256(tx_hash || output_index)`) until the
  /// real one is supplied by an offline signer's export, per this system's documented limitation:
  /// spends against a placeholder-keyed output MUST be rejected until the real key image replaces
  /// it.
  pub async fn start<R: DaemonRpc>(
    &self,
    rpc: &R,
    storage: &mut Storage,
    scanner: &Scanner,
    spend_scalar: Option<Scalar>,
  ) -> Result<(), SyncError> {
    if self.running.swap(true, Ordering::SeqCst) {
      return Ok(());
    }
    self.stop_requested.store(false, Ordering::SeqCst);
    *self.state.lock().expect("sync state mutex poisoned") =
      SyncState::Syncing { height: storage.sync_height() };
    tracing::info!(height = storage.sync_height(), "sync started");

    let mut attempts = 0usize;
    let result = loop {
      match self.sync_until_caught_up_or_stopped(rpc, storage, scanner, spend_scalar).await {
        Ok(()) => break Ok(()),
        Err(_) if self.stop_requested.load(Ordering::SeqCst) => break Ok(()),
        Err(err) => {
          attempts += 1;
          *self.state.lock().expect("sync state mutex poisoned") =
            SyncState::Error { attempts };
          tracing::error!(attempts, error = %err, "sync attempt failed");
          let _ = self.events.send(SyncEvent::Error { message: err.to_string() });

          if !self.config.auto_retry || attempts >= self.config.max_retry_attempts {
            break Err(err);
          }
          sleep(self.config.retry_delay).await;
          *self.state.lock().expect("sync state mutex poisoned") =
            SyncState::Syncing { height: storage.sync_height() };
        }
      }
    };

    self.running.store(false, Ordering::SeqCst);
    if self.stop_requested.load(Ordering::SeqCst) {
      *self.state.lock().expect("sync state mutex poisoned") = SyncState::Idle;
    }
    result
  }

  /// The inner loop: batch-fetch, reorg-check, scan, persist, repeat until the daemon's tip is
  /// reached or [`Self::stop`] is called.
  async fn sync_until_caught_up_or_stopped<R: DaemonRpc>(
    &self,
    rpc: &R,
    storage: &mut Storage,
    scanner: &Scanner,
    spend_scalar: Option<Scalar>,
  ) -> Result<(), SyncError> {
    loop {
      if self.stop_requested.load(Ordering::SeqCst) {
        return Ok(());
      }

      let height = storage.sync_height();
      let tip = rpc.get_height().await? as u64;
      if height >= tip {
        *self.state.lock().expect("sync state mutex poisoned") = SyncState::Synced { height };
        tracing::info!(height, "sync caught up to daemon tip");
        let _ = self.events.send(SyncEvent::Synced { height });
        return Ok(());
      }

      let batch_end = (height + self.config.batch_size).min(tip);
      let mut expected_previous_hash = storage.get_block_hash(height);
      let mut h = height + 1;

      while h <= batch_end {
        if self.stop_requested.load(Ordering::SeqCst) {
          return Ok(());
        }

        let block = rpc.get_block(h as usize).await?;

        if let Some(expected) = expected_previous_hash {
          if block.previous_hash != Some(expected) {
            let fork_point = self.resolve_reorg(h, rpc, storage).await?;
            h = fork_point;
            expected_previous_hash = storage.get_block_hash(h - 1);
            continue;
          }
        }

        self.apply_block(h, &block, rpc, storage, scanner, spend_scalar).await?;
        expected_previous_hash = Some(block.hash);

        *self.state.lock().expect("sync state mutex poisoned") =
          SyncState::Syncing { height: h };
        tracing::debug!(height = h, tip, "synced block");
        let _ = self.events.send(SyncEvent::Progress { height: h, tip });

        h += 1;
      }

      sleep(self.config.batch_delay).await;
    }
  }

  /// Walk backward from `suspected_height` until a height is found whose daemon-reported hash
  /// still matches what's persisted, roll storage back to it, and report the fork.
  async fn resolve_reorg<R: DaemonRpc>(
    &self,
    suspected_height: u64,
    rpc: &R,
    storage: &mut Storage,
  ) -> Result<u64, SyncError> {
    let prior_height = storage.sync_height();

    let mut candidate = suspected_height.saturating_sub(1);
    let fork_point = loop {
      if candidate == 0 {
        break 1;
      }
      let daemon_hash = rpc.get_block(candidate as usize).await?.hash;
      if storage.get_block_hash(candidate) == Some(daemon_hash) {
        break candidate + 1;
      }
      candidate -= 1;
    };

    storage.rollback_to(fork_point - 1)?;
    tracing::warn!(fork_point, prior_height, "reorg detected, rolled back to fork point");
    let _ = self.events.send(SyncEvent::ReorgDetected { fork_point, prior_height });
    Ok(fork_point)
  }

  /// Scan every transaction in `block`, persist recognized outputs and their owning/touching
  /// transactions, mark any stored output spent by one of the block's inputs, and advance the
  /// sync checkpoint past it.
  async fn apply_block<R: DaemonRpc>(
    &self,
    height: u64,
    block: &BlockWithTransactions,
    rpc: &R,
    storage: &mut Storage,
    scanner: &Scanner,
    spend_scalar: Option<Scalar>,
  ) -> Result<(), SyncError> {
    if block.transaction_hashes.is_empty() {
      storage.set_sync_height_and_hash(height, block.hash)?;
      return Ok(());
    }

    let fetched = rpc.get_transactions(&block.transaction_hashes).await?;
    if fetched.len() != block.transaction_hashes.len() {
      return Err(SyncError::Rpc(RpcError::InvalidNode(
        "daemon returned a different number of transactions than requested".into(),
      )));
    }

    for (tx_hash, fetched_tx) in block.transaction_hashes.iter().zip(fetched.iter()) {
      let tx = Transaction::read(&mut fetched_tx.bytes.as_slice())
        .map_err(SyncError::MalformedTransaction)?;
      if &tx.hash() != tx_hash {
        return Err(SyncError::Rpc(RpcError::InvalidNode(
          "fetched transaction's hash didn't match the requested hash".into(),
        )));
      }

      let mut spent_total: u128 = 0;
      for input in &tx.prefix().inputs {
        if let Input::ToKey { key_image, .. } = input {
          let key_image = key_image.to_bytes();
          if let Some(existing) = storage.get_output(&key_image) {
            spent_total += existing.amount.parse::<u128>().unwrap_or(0);
            storage.mark_output_spent(&key_image, *tx_hash)?;
          }
        }
      }

      let timelocked =
        scanner.scan_transaction(&tx, Some(&fetched_tx.output_indices), self.config.hardfork_version)?;
      let recognized = timelocked.all();

      let mut incoming_total: u128 = 0;
      let mut touched = BTreeSet::new();
      let mut payment_id = None;
      for output in recognized {
        let (account, subaddress) =
          output.subaddress().map(|index| (index.major(), index.minor())).unwrap_or((0, 0));
        touched.insert((account, subaddress));
        if payment_id.is_none() {
          payment_id = match output.payment_id() {
            Some(PaymentId::Encrypted(id)) => Some(id),
            _ => None,
          };
        }

        let commitment = output.commitment();
        incoming_total += u128::from(commitment.amount);

        let key_image = spend_scalar
          .and_then(|scalar| output.key_image(scalar))
          .map(|point| point.compress().to_bytes())
          .unwrap_or_else(|| placeholder_key_image(tx_hash, output.index_in_transaction()));

        storage.put_output(StoredOutput {
          key_image,
          output_key: output.key().to_bytes(),
          commitment_mask: commitment.mask.to_bytes(),
          amount: commitment.amount.to_string(),
          global_index: output.index_on_blockchain().unwrap_or_default(),
          transaction_hash: *tx_hash,
          index_in_transaction: output.index_in_transaction(),
          confirmation_height: Some(height),
          account,
          subaddress,
          spent: false,
          spending_transaction_hash: None,
          frozen: false,
          unlock_time: timelock_height_or_time(output.additional_timelock()),
        })?;
      }

      if !recognized.is_empty() || spent_total > 0 {
        let direction = if !recognized.is_empty() { Direction::Incoming } else { Direction::Outgoing };
        let fee = match &tx {
          Transaction::V2 { proofs: Some(proofs), .. } => proofs.base.fee,
          _ => 0,
        };
        let note = storage.get_transaction(tx_hash).and_then(|existing| existing.note.clone());
        let net_amount: i128 = incoming_total as i128 - spent_total as i128;

        storage.put_transaction(StoredTransaction {
          hash: *tx_hash,
          height: Some(height),
          timestamp: block.timestamp,
          fee,
          direction,
          account: touched.iter().next().map(|(account, _)| *account).unwrap_or(0),
          subaddresses: touched.iter().map(|(_, subaddress)| *subaddress).collect(),
          net_amount: net_amount.to_string(),
          payment_id,
          note,
        })?;
      }
    }

    storage.set_sync_height_and_hash(height, block.hash)?;
    Ok(())
  }
}

fn timelock_height_or_time(timelock: Timelock) -> u64 {
  match timelock {
    Timelock::None => 0,
    Timelock::Block(height) => height as u64,
    Timelock::Time(time) => time,
  }
}

/// The placeholder key image a view-only wallet records for an output it can't compute the real
/// key image for, per this system's documented key-image-import limitation. Never matches a real
/// key image, so such an output can never be (mis)recognized as spent by an ordinary scan.
fn placeholder_key_image(tx_hash: &[u8; 32], index_in_transaction: u64) -> [u8; 32] {
  let mut preimage = Vec::with_capacity(40);
  preimage.extend_from_slice(tx_hash);
  preimage.extend_from_slice(&index_in_transaction.to_le_bytes());
  keccak256(preimage)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn placeholder_key_image_is_deterministic_and_distinguishes_outputs() {
    let a = placeholder_key_image(&[1; 32], 0);
    let b = placeholder_key_image(&[1; 32], 1);
    let c = placeholder_key_image(&[1; 32], 0);
    assert_ne!(a, b);
    assert_eq!(a, c);
  }

  #[test]
  fn fresh_manager_is_idle_and_not_running() {
    let manager = SyncManager::new(SyncConfig::default());
    assert_eq!(manager.state(), SyncState::Idle);
    assert!(!manager.is_running());
  }

  #[test]
  fn stop_on_an_idle_manager_reports_idle() {
    let manager = SyncManager::new(SyncConfig::default());
    manager.stop();
    assert_eq!(manager.state(), SyncState::Idle);
  }
}
