use serde::{Deserialize, Serialize};

use monero_wallet_primitives::Scalar;

use crate::send::BuiltTransaction;
use crate::transaction::{Input, Transaction};

/// An error serializing or deserializing an offline-signing export.
#[derive(Clone, PartialEq, Eq, Debug, thiserror::Error)]
pub enum ExportError {
  /// A hex field didn't decode.
  #[error("malformed hex field: {0}")]
  MalformedHex(String),
  /// A decoded field had the wrong length for what it represents.
  #[error("field {field} had length {got}, expected {expected}")]
  WrongLength {
    /// The field's name.
    field: &'static str,
    /// The length actually found.
    got: usize,
    /// The expected length.
    expected: usize,
  },
  /// The embedded prefix or transaction bytes failed to parse.
  #[error("malformed transaction bytes: {0}")]
  MalformedTransaction(String),
  /// An unsupported export version was encountered.
  #[error("unsupported export version {0}")]
  UnsupportedVersion(u32),
  /// A transaction carried a miner input, which this export format has no use for.
  #[error("a miner transaction cannot be exported for offline signing")]
  MinerTransaction,
}

fn hex_to_array<const N: usize>(field: &'static str, s: &str) -> Result<[u8; N], ExportError> {
  let bytes = hex::decode(s).map_err(|e| ExportError::MalformedHex(e.to_string()))?;
  let len = bytes.len();
  bytes.try_into().map_err(|_| ExportError::WrongLength { field, got: len, expected: N })
}

const EXPORT_VERSION: u32 = 1;

/// A single planned input: the ring it'll be signed against, the real spend's position within
/// it (both absolutely and within the ring), and its key image.
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct UnsignedTxInput {
  /// The real spend's global blockchain output index.
  pub real_global_index: u64,
  /// The real spend's position within the ring below.
  pub real_index_in_ring: usize,
  /// The ring's one-time public keys, ascending by global index, hex-encoded.
  pub ring_pubkeys_hex: Vec<String>,
  /// The ring's Pedersen commitments, in the same order, hex-encoded.
  pub ring_commitments_hex: Vec<String>,
  /// The spent output's key image, hex-encoded.
  pub key_image_hex: String,
}

/// A single planned output: its position, opened amount, and the data needed to reconstruct its
/// pseudo-out balance.
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct UnsignedTxOutput {
  /// The output's position in the transaction.
  pub index: usize,
  /// The opened amount.
  pub amount: u64,
  /// The commitment's blinding mask, hex-encoded.
  pub mask_hex: String,
  /// The output's Pedersen commitment, hex-encoded.
  pub commitment_hex: String,
}

/// An unsigned transaction, exported from an online (view-only) wallet for an offline signer
/// holding the private spend key to complete.
///
/// Carries everything the online half already computed (rings, one-time keys, commitments,
/// encrypted amounts, key images) so the offline half only needs to produce the CLSAG responses
/// and Bulletproof+ range proof over already-fixed values; it has no reason to re-derive anything
/// the online half already derived, and must not, since doing so independently could disagree
/// with what the online half already committed to in `tx_prefix_hex`.
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct UnsignedTxExport {
  /// The export format's version.
  pub version: u32,
  /// The unsigned transaction's prefix, hex-encoded.
  pub tx_prefix_hex: String,
  /// The prefix's hash, the message the offline signer's CLSAGs ultimately sign over (bound to
  /// the RingCT proofs' non-signature material).
  pub prefix_hash_hex: String,
  /// Each input's ring, real position, and key image.
  pub inputs: Vec<UnsignedTxInput>,
  /// Each output's opening, in output order.
  pub outputs: Vec<UnsignedTxOutput>,
  /// The RingCT type this transaction's proofs are shaped for.
  pub rct_type: u8,
  /// The transaction's fee.
  pub fee: u64,
  /// Whatever the sender's own change output amount is, so the offline signer can recognize it
  /// without rederiving every output's opening.
  pub change: u64,
}

impl UnsignedTxExport {
  /// Build an export from a [`BuiltTransaction`] and the change amount it was built with.
  pub fn new(built: &BuiltTransaction, change: u64) -> Result<Self, ExportError> {
    let Transaction::V2 { prefix, proofs } = &built.transaction else {
      return Err(ExportError::MalformedTransaction("only RingCT transactions can be exported".into()));
    };
    let proofs = proofs.as_ref().ok_or(ExportError::MinerTransaction)?;

    let mut prefix_bytes = Vec::new();
    prefix.write(&mut prefix_bytes).expect("write to Vec<u8> is infallible");

    let inputs = prefix
      .inputs
      .iter()
      .zip(&built.input_rings)
      .map(|(input, ring)| {
        let Input::ToKey { key_image, .. } = input else { return Err(ExportError::MinerTransaction) };
        let real = ring.ring()[ring.real_index()];
        Ok(UnsignedTxInput {
          real_global_index: real.global_index,
          real_index_in_ring: ring.real_index(),
          ring_pubkeys_hex: ring.ring().iter().map(|m| hex::encode(m.key.compress().to_bytes())).collect(),
          ring_commitments_hex: ring.ring().iter().map(|m| hex::encode(m.commitment.compress().to_bytes())).collect(),
          key_image_hex: hex::encode(key_image.to_bytes()),
        })
      })
      .collect::<Result<Vec<_>, ExportError>>()?;

    let outputs = built
      .output_openings
      .iter()
      .enumerate()
      .map(|(index, opening)| UnsignedTxOutput {
        index,
        amount: opening.amount,
        mask_hex: hex::encode(opening.mask.to_bytes()),
        commitment_hex: hex::encode(opening.compress().to_bytes()),
      })
      .collect();

    Ok(Self {
      version: EXPORT_VERSION,
      tx_prefix_hex: hex::encode(prefix_bytes),
      prefix_hash_hex: hex::encode(prefix.hash(2)),
      inputs,
      outputs,
      rct_type: proofs.base.rct_type,
      fee: proofs.base.fee,
      change,
    })
  }

  /// Decode the embedded prefix's hex bytes.
  pub fn prefix_bytes(&self) -> Result<Vec<u8>, ExportError> {
    hex::decode(&self.tx_prefix_hex).map_err(|e| ExportError::MalformedHex(e.to_string()))
  }

  /// Decode a single input's key image.
  pub fn input_key_image(&self, index: usize) -> Result<[u8; 32], ExportError> {
    hex_to_array("key_image_hex", &self.inputs[index].key_image_hex)
  }

  /// Decode a single output's commitment mask.
  pub fn output_mask(&self, index: usize) -> Result<Scalar, ExportError> {
    let bytes: [u8; 32] = hex_to_array("mask_hex", &self.outputs[index].mask_hex)?;
    Scalar::read(&mut bytes.as_slice()).map_err(|e| ExportError::MalformedTransaction(e.to_string()))
  }
}

/// A completed, signed transaction ready for broadcast, returned by the offline signer to the
/// online wallet (e.g. over an air-gapped QR code or SD card exchange).
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct SignedTxExport {
  /// The export format's version.
  pub version: u32,
  /// The fully signed transaction's canonical wire bytes, hex-encoded.
  pub tx_blob_hex: String,
  /// The signed transaction's hash.
  pub tx_hash_hex: String,
  /// Every spent input's key image, in input order, so the online wallet can mark them spent
  /// without re-parsing the blob.
  pub key_images_hex: Vec<String>,
  /// The transaction's fee.
  pub fee: u64,
}

impl SignedTxExport {
  /// Wrap a completed transaction for export.
  pub fn new(transaction: &Transaction) -> Result<Self, ExportError> {
    let mut buf = Vec::new();
    transaction.write(&mut buf).expect("write to Vec<u8> is infallible");

    let key_images_hex = transaction
      .prefix()
      .inputs
      .iter()
      .filter_map(|input| match input {
        Input::ToKey { key_image, .. } => Some(hex::encode(key_image.to_bytes())),
        Input::Gen(_) => None,
      })
      .collect();

    let fee = match transaction {
      Transaction::V2 { proofs: Some(proofs), .. } => proofs.base.fee,
      _ => 0,
    };

    Ok(Self {
      version: EXPORT_VERSION,
      tx_blob_hex: hex::encode(buf),
      tx_hash_hex: hex::encode(transaction.hash()),
      key_images_hex,
      fee,
    })
  }

  /// Deserialize the signed transaction.
  pub fn transaction(&self) -> Result<Transaction, ExportError> {
    if self.version != EXPORT_VERSION {
      return Err(ExportError::UnsupportedVersion(self.version));
    }
    let bytes = hex::decode(&self.tx_blob_hex).map_err(|e| ExportError::MalformedHex(e.to_string()))?;
    Transaction::read(&mut bytes.as_slice()).map_err(|e| ExportError::MalformedTransaction(e.to_string()))
  }
}

#[cfg(test)]
mod tests {
  use monero_wallet_primitives::{Commitment, CompressedPoint, Point};

  use crate::decoys::{Decoys, RingMember};
  use crate::ringct::{BulletproofPlaceholder, EncryptedAmount, RctBase, RctProofsPlaceholder};
  use crate::transaction::{Output, Timelock, TransactionPrefix};

  use super::*;

  fn sample_built() -> BuiltTransaction {
    let key_image = CompressedPoint::G;
    let prefix = TransactionPrefix {
      additional_timelock: Timelock::None,
      inputs: vec![Input::ToKey { amount: None, key_offsets: vec![5, 3], key_image }],
      outputs: vec![Output { amount: None, key: CompressedPoint::G, view_tag: Some(1) }],
      extra: vec![],
    };
    let proofs = RctProofsPlaceholder {
      base: RctBase {
        rct_type: crate::ringct::RCT_TYPE_BULLETPROOF_PLUS,
        fee: 1000,
        encrypted_amounts: vec![EncryptedAmount::Compact { amount: [0; 8] }],
        commitments: vec![CompressedPoint::G],
      },
      clsags: vec![],
      pseudo_outs: vec![],
      bulletproof: BulletproofPlaceholder(vec![]),
    };
    let ring = vec![
      RingMember { global_index: 5, key: Point::hash_to_point([1; 32]), commitment: Point::hash_to_point([2; 32]) },
      RingMember { global_index: 8, key: Point::hash_to_point([3; 32]), commitment: Point::hash_to_point([4; 32]) },
    ];
    BuiltTransaction {
      transaction: Transaction::V2 { prefix, proofs: Some(proofs) },
      output_openings: vec![Commitment::new(Scalar::from(4u64), 500_000)],
      input_rings: vec![Decoys::for_test(ring, 0)],
    }
  }

  #[test]
  fn unsigned_export_round_trips_the_prefix() {
    let built = sample_built();
    let export = UnsignedTxExport::new(&built, 500_000).unwrap();
    let json = serde_json::to_string(&export).unwrap();
    let parsed: UnsignedTxExport = serde_json::from_str(&json).unwrap();
    let mut expected_prefix_bytes = Vec::new();
    built.transaction.prefix().write(&mut expected_prefix_bytes).unwrap();
    assert_eq!(parsed.prefix_bytes().unwrap(), expected_prefix_bytes);
    assert_eq!(parsed.inputs[0].real_global_index, 5);
    assert_eq!(parsed.inputs.len(), 1);
    assert_eq!(parsed.outputs[0].amount, 500_000);
  }

  #[test]
  fn signed_export_round_trips() {
    let built = sample_built();
    let export = SignedTxExport::new(&built.transaction).unwrap();
    let json = serde_json::to_string(&export).unwrap();
    let parsed: SignedTxExport = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed.transaction().unwrap(), built.transaction);
    assert_eq!(parsed.key_images_hex.len(), 1);
  }

  #[test]
  fn malformed_hex_is_rejected() {
    let export = UnsignedTxExport {
      version: EXPORT_VERSION,
      tx_prefix_hex: "not hex".into(),
      prefix_hash_hex: String::new(),
      inputs: vec![],
      outputs: vec![],
      rct_type: 0,
      fee: 0,
      change: 0,
    };
    assert!(matches!(export.prefix_bytes(), Err(ExportError::MalformedHex(_))));
  }
}
