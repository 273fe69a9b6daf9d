#![doc = "The contract a Monero daemon connection must satisfy: trait surfaces for chain queries and decoy selection, JSON-RPC wire types, and the retry/circuit-breaker resilience layer wrapping them."]
#![deny(missing_docs)]

mod circuit_breaker;
mod error;
pub mod jsonrpc;
mod retry;

pub use circuit_breaker::CircuitBreaker;
pub use error::RpcError;
pub use retry::RetryPolicy;

use std::ops::Range;

use monero_wallet_primitives::Point;

/// A single entry from `get_outs`: an output's one-time key and amount commitment, and whether
/// it's presently unlocked.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct OutputEntry {
  /// The output's one-time public key.
  pub key: Point,
  /// The output's Pedersen commitment.
  pub commitment: Point,
  /// Whether the output has cleared both its default and any additional unlock time.
  pub unlocked: bool,
}

/// The subset of daemon RPC calls transaction construction and chain sync need.
///
/// Transport (HTTP, Tor, IPC) is deliberately not part of this contract: implementors own the
/// connection, and translate transport failures into [`RpcError::ConnectionError`].
pub trait DaemonRpc {
  /// The daemon's current chain height.
  fn get_height(&self) -> impl std::future::Future<Output = Result<usize, RpcError>> + Send;

  /// Fetch a full block (and its transactions) by height.
  fn get_block(
    &self,
    height: usize,
  ) -> impl std::future::Future<Output = Result<BlockWithTransactions, RpcError>> + Send;

  /// The daemon's current base fee estimate, in atomic units per byte.
  fn get_fee_estimate(&self) -> impl std::future::Future<Output = Result<u64, RpcError>> + Send;

  /// Transaction hashes currently sitting in the daemon's mempool.
  fn get_transaction_pool(
    &self,
  ) -> impl std::future::Future<Output = Result<Vec<[u8; 32]>, RpcError>> + Send;

  /// Broadcast a signed transaction.
  fn send_raw_transaction(
    &self,
    tx_bytes: Vec<u8>,
  ) -> impl std::future::Future<Output = Result<(), RpcError>> + Send;

  /// Look up outputs by their global output index.
  fn get_outs(
    &self,
    indices: &[u64],
  ) -> impl std::future::Future<Output = Result<Vec<OutputEntry>, RpcError>> + Send;

  /// Fetch full transactions by hash, each with its canonical serialized bytes and the global
  /// RingCT output index the daemon assigned each of its outputs.
  ///
  /// Returns one entry per requested hash, in the same order; a daemon that's pruned a
  /// transaction (or never had it) is a node-trust failure (`RpcError::InvalidNode`), not a
  /// missing optional entry, since every hash here was just read out of a block the same daemon
  /// reported.
  fn get_transactions(
    &self,
    hashes: &[[u8; 32]],
  ) -> impl std::future::Future<Output = Result<Vec<FetchedTransaction>, RpcError>> + Send;
}

/// A transaction as `get_transactions` returns it: its bytes, and the global output index
/// assigned to each of its outputs (needed to record where a recognized output sits in the
/// blockchain's RingCT output set, and to later reference it in a spend's ring).
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct FetchedTransaction {
  /// The transaction's canonical serialized bytes.
  pub bytes: Vec<u8>,
  /// The global RingCT output index of each of this transaction's outputs, in order.
  pub output_indices: Vec<u64>,
}

/// A block with its miner and regular transactions, as `get_block` returns them.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct BlockWithTransactions {
  /// The block's hash.
  pub hash: [u8; 32],
  /// The previous block's hash; `None` only for the genesis block.
  pub previous_hash: Option<[u8; 32]>,
  /// The block's height.
  pub height: usize,
  /// The block's Unix timestamp.
  pub timestamp: u64,
  /// Every transaction hash included in this block, miner transaction first.
  pub transaction_hashes: Vec<[u8; 32]>,
}

/// The decoy-selection oracle: the subset of daemon RPC the ring-member sampler needs, kept
/// separate from [`DaemonRpc`] so it can be mocked or backed by a local index independently.
pub trait DecoyRpc {
  /// The cumulative count of RingCT outputs up to and including each block in `range`.
  fn get_output_distribution(
    &self,
    range: Range<usize>,
  ) -> impl std::future::Future<Output = Result<Vec<u64>, RpcError>> + Send;

  /// The height up to which `get_output_distribution` can answer.
  fn get_output_distribution_end_height(
    &self,
  ) -> impl std::future::Future<Output = Result<usize, RpcError>> + Send;

  /// For each global output index in `indices`, the output's key and commitment if it's unlocked
  /// by `height`, or `None` if it's still time-locked.
  ///
  /// `fingerprintable_deterministic` requests a response free of per-call randomization, for use
  /// when the exact same ring must be reconstructed later (e.g. re-verifying an unsigned export).
  fn get_unlocked_outputs(
    &self,
    indices: &[u64],
    height: usize,
    fingerprintable_deterministic: bool,
  ) -> impl std::future::Future<Output = Result<Vec<Option<[Point; 2]>>, RpcError>> + Send;
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn output_entry_carries_unlock_state() {
    let entry =
      OutputEntry { key: Point::hash_to_point([1; 32]), commitment: Point::hash_to_point([2; 32]), unlocked: true };
    assert!(entry.unlocked);
  }
}
