use std::collections::HashMap;

use monero_wallet_address::SubaddressIndex;
use monero_wallet_primitives::{Commitment, CompressedPoint, Point, Scalar};

use crate::extra::Extra;
use crate::output::{AbsoluteId, Metadata, OutputData, RelativeId, WalletOutput};
use crate::ringct::EncryptedAmount;
use crate::transaction::{Input, Timelock, Transaction};
use crate::view_pair::{GuaranteedViewPair, ViewPair};
use crate::SharedKeyDerivations;

/// An error recovering outputs from a transaction.
#[derive(Clone, PartialEq, Eq, Debug, thiserror::Error)]
pub enum ScanError {
  /// The transaction's `extra` field didn't parse.
  #[error("malformed extra field: {0}")]
  MalformedExtra(String),
  /// The transaction declared a different number of output indexes than it has outputs.
  #[error("output index count ({given}) didn't match output count ({expected})")]
  OutputIndexMismatch {
    /// The number of indexes given.
    given: usize,
    /// The number of outputs the transaction actually has.
    expected: usize,
  },
}

fn basepoint() -> Point {
  CompressedPoint::G.decompress().expect("G must decompress")
}

/// Output scanning shared between [`Scanner`] and [`GuaranteedScanner`].
struct InternalScanner {
  pair: ViewPair,
  guaranteed: bool,
  subaddresses: HashMap<CompressedPoint, Option<SubaddressIndex>>,
}

impl InternalScanner {
  fn new(pair: ViewPair, guaranteed: bool) -> Self {
    let mut subaddresses = HashMap::new();
    subaddresses.insert(pair.spend_compressed(), None);
    Self { pair, guaranteed, subaddresses }
  }

  /// Register a subaddress this scanner should recognize outputs sent to.
  fn register_subaddress(&mut self, index: SubaddressIndex) {
    let (spend, _view) = self.pair.subaddress_keys(index);
    self.subaddresses.insert(spend, Some(index));
  }

  fn scan_transaction(
    &self,
    tx: &Transaction,
    output_indexes: Option<&[u64]>,
  ) -> Result<Vec<WalletOutput>, ScanError> {
    let Transaction::V2 { prefix, proofs } = tx else { return Ok(vec![]) };

    if let Some(indexes) = output_indexes {
      if indexes.len() != prefix.outputs.len() {
        return Err(ScanError::OutputIndexMismatch {
          given: indexes.len(),
          expected: prefix.outputs.len(),
        });
      }
    }

    let extra = Extra::read(&mut prefix.extra.as_slice())
      .map_err(|e| ScanError::MalformedExtra(e.to_string()))?;
    let Some((keys, additional_keys)) = extra.keys() else { return Ok(vec![]) };
    let tx_key = keys[0];

    let is_miner_tx = matches!(prefix.inputs.first(), Some(Input::Gen(_)));
    let uniqueness =
      self.guaranteed.then(|| SharedKeyDerivations::uniqueness(&prefix.inputs));

    let tx_hash = tx.hash();
    let payment_id = extra.payment_id();
    let arbitrary_data = extra.arbitrary_data();

    let mut found = vec![];
    'outputs: for (o, output) in prefix.outputs.iter().enumerate() {
      let Some(output_point) = output.key.decompress() else { continue };

      let mut candidate_keys = vec![tx_key];
      if let Some(additional) = &additional_keys {
        if let Some(key) = additional.get(o) {
          candidate_keys.push(*key);
        }
      }

      for candidate_key in candidate_keys {
        let ecdh = candidate_key * self.pair.view();
        let derivations = SharedKeyDerivations::output_derivations(uniqueness, ecdh, o);

        if let Some(view_tag) = output.view_tag {
          if view_tag != derivations.view_tag {
            continue;
          }
        }

        // The candidate subaddress spend key: B = P - shared_key*G. Point exposes no subtraction,
        // so negate the scalar (Ed25519's order `l` minus it) instead.
        let negated_shared_key = Scalar::ZERO - derivations.shared_key;
        let candidate_spend_key = output_point + (basepoint() * negated_shared_key);

        let Some(subaddress) = self.subaddresses.get(&candidate_spend_key.compress()).copied()
        else {
          continue;
        };

        let key_offset = match subaddress {
          None => derivations.shared_key,
          Some(index) => derivations.shared_key + self.pair.subaddress_derivation(index),
        };

        let commitment = if is_miner_tx {
          Commitment::new(Scalar::ONE, output.amount.unwrap_or(0))
        } else {
          let Some(proofs) = proofs else { continue };
          let Some(enc_amount) = proofs.base.encrypted_amounts.get(o) else { continue };
          let Some(commitment_compressed) = proofs.base.commitments.get(o) else { continue };
          let Some((mask, amount)) = derivations.decrypt(enc_amount, *commitment_compressed) else {
            continue;
          };
          Commitment::new(mask, amount)
        };

        let output_payment_id = payment_id.map(|id| id ^ SharedKeyDerivations::payment_id_xor(ecdh));

        found.push(WalletOutput::new(
          AbsoluteId { transaction: tx_hash, index_in_transaction: o as u64 },
          output_indexes.map(|indexes| RelativeId { index_on_blockchain: indexes[o] }),
          OutputData { key: output.key, key_offset, commitment },
          Metadata {
            additional_timelock: prefix.additional_timelock,
            subaddress,
            payment_id: output_payment_id,
            arbitrary_data: arbitrary_data.clone(),
          },
        ));
        continue 'outputs;
      }
    }

    Ok(found)
  }
}

/// Outputs recovered from a transaction, filterable by their additional timelock.
#[derive(Clone, Debug, Default)]
pub struct Timelocked(Vec<WalletOutput>);

impl Timelocked {
  /// Every output this scan recovered, including any still additionally timelocked.
  pub fn all(&self) -> &[WalletOutput] {
    &self.0
  }

  /// Outputs with no additional timelock (only the transaction's own default unlock time, which
  /// the chain itself enforces, applies).
  pub fn not_additionally_locked(&self) -> Vec<&WalletOutput> {
    self.0.iter().filter(|o| o.additional_timelock() == Timelock::None).collect()
  }

  /// Outputs whose additional timelock has cleared by `height`/`time`.
  pub fn additional_timelock_satisfied_by(&self, height: usize, time: u64) -> Vec<&WalletOutput> {
    self.0.iter().filter(|o| o.additional_timelock().satisfied_by(height, time)).collect()
  }

  /// Every output, disregarding any additional timelock. Useful for display purposes where a
  /// caller wants to show an incoming (but not yet spendable) balance.
  pub fn ignore_additional_timelock(&self) -> &[WalletOutput] {
    &self.0
  }
}

/// Scans transactions for outputs received by a [`ViewPair`].
pub struct Scanner(InternalScanner);

impl Scanner {
  /// Build a scanner for the given view pair.
  pub fn new(pair: ViewPair) -> Self {
    Self(InternalScanner::new(pair, false))
  }

  /// Register a subaddress this scanner should recognize outputs sent to.
  pub fn register_subaddress(&mut self, index: SubaddressIndex) {
    self.0.register_subaddress(index);
  }

  /// Scan a transaction, recovering any outputs it sent to this scanner's view pair (or
  /// registered subaddresses). `output_indexes`, if given, must have one entry per output, its
  /// global index on the blockchain's RingCT output set.
  ///
  /// `hardfork_version` governs whether unencrypted payment IDs are trusted: from v12 onward
  /// they're stripped, since the protocol no longer considers them meaningful.
  pub fn scan_transaction(
    &self,
    tx: &Transaction,
    output_indexes: Option<&[u64]>,
    hardfork_version: u64,
  ) -> Result<Timelocked, ScanError> {
    let mut outputs = self.0.scan_transaction(tx, output_indexes)?;
    strip_unencrypted_payment_ids_post_hardfork(&mut outputs, hardfork_version);
    Ok(Timelocked(outputs))
  }
}

/// Scans transactions for outputs received by a [`GuaranteedViewPair`], accepting only outputs
/// using the uniqueness-bound "guaranteed" derivation.
pub struct GuaranteedScanner(InternalScanner);

impl GuaranteedScanner {
  /// Build a scanner for the given guaranteed view pair.
  pub fn new(pair: GuaranteedViewPair) -> Self {
    Self(InternalScanner::new(pair.0, true))
  }

  /// Register a subaddress this scanner should recognize outputs sent to.
  pub fn register_subaddress(&mut self, index: SubaddressIndex) {
    self.0.register_subaddress(index);
  }

  /// Scan a transaction. See [`Scanner::scan_transaction`].
  pub fn scan_transaction(
    &self,
    tx: &Transaction,
    output_indexes: Option<&[u64]>,
    hardfork_version: u64,
  ) -> Result<Timelocked, ScanError> {
    let mut outputs = self.0.scan_transaction(tx, output_indexes)?;
    strip_unencrypted_payment_ids_post_hardfork(&mut outputs, hardfork_version);
    Ok(Timelocked(outputs))
  }
}

fn strip_unencrypted_payment_ids_post_hardfork(outputs: &mut [WalletOutput], hardfork_version: u64) {
  if hardfork_version < 12 {
    return;
  }
  for output in outputs {
    if matches!(output.payment_id(), Some(crate::extra::PaymentId::Unencrypted(_))) {
      output.clear_payment_id();
    }
  }
}
