use rand_core::{CryptoRng, RngCore};

use monero_wallet_address::{Address, AddressType};
use monero_wallet_primitives::{Commitment, CompressedPoint, Point, Scalar};
use monero_wallet_rpc::DecoyRpc;

use crate::decoys::{self, DecoyError, Decoys};
use crate::extra::Extra;
use crate::output::WalletOutput;
use crate::ringct::{ClsagPlaceholder, EncryptedAmount, RctBase, RctProofsPlaceholder};
use crate::transaction::{Input, Output, Timelock, Transaction, TransactionPrefix};
use crate::SharedKeyDerivations;

fn basepoint() -> Point {
  CompressedPoint::G.decompress().expect("G must decompress")
}

/// A transaction output a [`build`] call must create: an address and the amount to send it.
#[derive(Clone, Copy, Debug)]
pub struct Destination {
  /// The destination address. A subaddress or integrated address triggers this output's sender
  /// ECDH derivation to use its own per-output additional key, per Monero's subaddress-output
  /// convention.
  pub address: Address,
  /// The amount to send, in atomic units.
  pub amount: u64,
}

impl Destination {
  /// Build a destination.
  pub fn new(address: Address, amount: u64) -> Self {
    Self { address, amount }
  }
}

/// An error building a transaction.
#[derive(Clone, Debug, thiserror::Error)]
pub enum BuildError {
  /// No destinations were given.
  #[error("a transaction needs at least one destination")]
  NoDestinations,
  /// No inputs were given.
  #[error("a transaction needs at least one input")]
  NoInputs,
  /// More than 16 outputs were requested, exceeding what a single transaction's `extra` and
  /// additional-keys encoding is sized for.
  #[error("too many outputs ({0}) for a single transaction")]
  TooManyOutputs(usize),
  /// The inputs' total amount didn't cover the destinations' total plus the fee.
  #[error("inputs ({inputs}) don't cover destinations plus fee ({required})")]
  InsufficientFunds {
    /// The inputs' total amount.
    inputs: u64,
    /// The destinations' total amount plus the fee.
    required: u64,
  },
  /// An input's one-time key or commitment didn't decompress to a valid curve point.
  #[error("an input's key or commitment was invalid")]
  InvalidInput,
  /// Selecting decoys for an input failed.
  #[error("decoy selection failed: {0}")]
  Decoys(#[from] DecoyError),
  /// Arbitrary data exceeded the size this library's `extra` convention can carry.
  #[error("arbitrary data chunk exceeds the maximum size")]
  ArbitraryDataTooLarge,
}

/// A fully assembled, canonically serialized transaction, along with the per-output openings
/// (commitment mask and amount) its own sender needs to remember — e.g. to recognize its own
/// change output when scanning, without waiting on a daemon round-trip.
#[derive(Clone, Debug)]
pub struct BuiltTransaction {
  /// The assembled transaction.
  pub transaction: Transaction,
  /// Each output's commitment opening, in output order, matching `transaction.prefix().outputs`.
  pub output_openings: Vec<Commitment>,
  /// Each input's selected ring, in input order, matching `transaction.prefix().inputs`. Kept
  /// alongside the transaction so an offline-signing export can carry the rings without a second
  /// daemon round-trip.
  pub input_rings: Vec<Decoys>,
}

/// Build a RingCT transaction spending `inputs` to `destinations`, with any leftover amount
/// beyond the destinations' total plus `fee` returned to `change_address`.
///
/// Implements Monero's sender-side algorithm: a fresh transaction key `r`, per-output ECDH shared
/// secrets (using the destination's spend key directly, or its own additional key for subaddress
/// and integrated destinations), one-time output keys, view tags, deterministic commitment masks
/// (so [`SharedKeyDerivations::decrypt`]'s compact-encoding recovery works for the sender's own
/// change output same as any recipient), and delta-encoded ring offsets from freshly selected
/// decoys. The assembled transaction carries [`ClsagPlaceholder`]/[`crate::ringct::BulletproofPlaceholder`]
/// proof shapes rather than sound signatures/range proofs; see their documentation.
pub async fn build<R: RngCore + CryptoRng>(
  rng: &mut R,
  rpc: &impl DecoyRpc,
  height: usize,
  min_decoy_age: usize,
  spend_scalar: Scalar,
  inputs: Vec<WalletOutput>,
  destinations: Vec<Destination>,
  change_address: Address,
  fee: u64,
  arbitrary_data: Vec<Vec<u8>>,
) -> Result<BuiltTransaction, BuildError> {
  if inputs.is_empty() {
    return Err(BuildError::NoInputs);
  }
  if destinations.is_empty() {
    return Err(BuildError::NoDestinations);
  }

  let destinations_total: u64 = destinations.iter().map(|d| d.amount).sum();
  let inputs_total: u64 =
    inputs.iter().map(|i| i.commitment().amount).try_fold(0u64, |acc, a| acc.checked_add(a))
      .ok_or(BuildError::InsufficientFunds { inputs: u64::MAX, required: destinations_total + fee })?;
  let required = destinations_total.checked_add(fee).ok_or(BuildError::InsufficientFunds {
    inputs: inputs_total,
    required: u64::MAX,
  })?;
  let change = inputs_total
    .checked_sub(required)
    .ok_or(BuildError::InsufficientFunds { inputs: inputs_total, required })?;

  let mut destinations = destinations;
  if change > 0 {
    destinations.push(Destination::new(change_address, change));
  }
  if destinations.len() > 16 {
    return Err(BuildError::TooManyOutputs(destinations.len()));
  }

  // Step 1: a fresh transaction key, r, with R = r*G published as the transaction's public key.
  let r = Scalar::random(rng);
  let tx_public_key = basepoint() * r;

  // Step 2: per-output ECDH derivation. A subaddress (or integrated) destination gets its own
  // additional key r*B_spend so its ECDH, S = r*A, only the recipient's view key can reproduce;
  // standard destinations share the single transaction key.
  let mut planned = Vec::with_capacity(destinations.len());
  let mut additional_keys = Vec::new();
  for destination in &destinations {
    let is_subaddress = matches!(destination.address.kind(), AddressType::Subaddress);
    let spend = destination
      .address
      .spend()
      .decompress()
      .ok_or(BuildError::InvalidInput)?;
    let view = destination
      .address
      .view()
      .decompress()
      .ok_or(BuildError::InvalidInput)?;

    let output_ecdh_key = if is_subaddress { spend } else { tx_public_key };
    additional_keys.push(if is_subaddress { (spend * r).compress() } else { tx_public_key.compress() });

    let ecdh = view * r;
    planned.push((destination, output_ecdh_key, ecdh, spend, is_subaddress));
  }

  let uniqueness_inputs = build_key_images_for_uniqueness(spend_scalar, &inputs)?;
  let uniqueness = Some(SharedKeyDerivations::uniqueness(&uniqueness_inputs));

  let mut outputs = Vec::with_capacity(planned.len());
  let mut output_openings = Vec::with_capacity(planned.len());
  let mut encrypted_amounts = Vec::with_capacity(planned.len());
  let mut commitments = Vec::with_capacity(planned.len());

  for (o, (destination, _output_ecdh_key, ecdh, spend, is_subaddress)) in planned.drain(..).enumerate() {
    let derivations = SharedKeyDerivations::output_derivations(uniqueness, ecdh, o);

    // Step 3: the one-time output key P = H(S || o)*G + B.
    let one_time_key = (basepoint() * derivations.shared_key) + spend;

    let mask = derivations.commitment_mask();
    let commitment = Commitment::new(mask, destination.amount);
    let encrypted_amount = EncryptedAmount::Compact { amount: derivations.compact_amount_encryption(destination.amount) };

    outputs.push(Output {
      amount: None,
      key: one_time_key.compress(),
      view_tag: Some(derivations.view_tag),
    });
    output_openings.push(commitment);
    encrypted_amounts.push(encrypted_amount);
    commitments.push(commitment.compress());

    let _ = is_subaddress;
  }

  // Step 4: assemble `extra` with the transaction key and any per-destination additional keys.
  // Every output needs an entry here, not just subaddress-destined ones, since scanning indexes
  // this vector directly by output position.
  let mut extra = Extra::new(tx_public_key.compress(), additional_keys);
  if let Some(payment_id) = integrated_payment_id(&destinations) {
    let ecdh_for_payment_id = planned_ecdh_for_payment_id(&destinations, r)?;
    let xor = SharedKeyDerivations::payment_id_xor(ecdh_for_payment_id);
    let mut nonce = Vec::with_capacity(9);
    crate::extra::PaymentId::Encrypted(xor_payment_id(payment_id, xor))
      .write(&mut nonce)
      .expect("write to Vec<u8> is infallible");
    extra.push_nonce(nonce);
  }
  for chunk in &arbitrary_data {
    if chunk.len() > crate::extra::MAX_ARBITRARY_DATA_SIZE {
      return Err(BuildError::ArbitraryDataTooLarge);
    }
    let mut nonce = Vec::with_capacity(1 + chunk.len());
    nonce.push(crate::extra::ARBITRARY_DATA_MARKER);
    nonce.extend_from_slice(chunk);
    extra.push_nonce(nonce);
  }

  // Step 5: select decoys and build the ring for each input.
  let mut tx_inputs = Vec::with_capacity(inputs.len());
  let mut selected_rings: Vec<Decoys> = Vec::with_capacity(inputs.len());
  for input in &inputs {
    let decoys = decoys::select_decoys(rng, rpc, decoys::RING_SIZE, height, min_decoy_age, input).await?;
    let key_image = spend_key_image(spend_scalar, input)?;
    tx_inputs.push(Input::ToKey {
      amount: None,
      key_offsets: decoys.offsets(),
      key_image: key_image.compress(),
    });
    selected_rings.push(decoys);
  }

  let prefix = TransactionPrefix {
    additional_timelock: Timelock::None,
    inputs: tx_inputs,
    outputs,
    extra: extra.serialize(),
  };

  // Step 6: pseudo-out commitments balancing the real output commitments plus the openly
  // committed fee. Every input but the last gets a freshly randomized mask; the last input's mask
  // is the residual making `sum(pseudo_outs) == sum(outputs) + fee*H` hold exactly.
  let output_mask_sum =
    output_openings.iter().fold(Scalar::ZERO, |acc, c| acc + c.mask);
  let mut pseudo_out_masks = Vec::with_capacity(inputs.len());
  let mut mask_sum_so_far = Scalar::ZERO;
  for _ in 0 .. inputs.len().saturating_sub(1) {
    let mask = Scalar::random(rng);
    mask_sum_so_far = mask_sum_so_far + mask;
    pseudo_out_masks.push(mask);
  }
  pseudo_out_masks.push(output_mask_sum - mask_sum_so_far);

  let pseudo_outs: Vec<CompressedPoint> = inputs
    .iter()
    .zip(&pseudo_out_masks)
    .map(|(input, mask)| Commitment::new(*mask, input.commitment().amount).compress())
    .collect();

  let clsags = inputs
    .iter()
    .zip(&selected_rings)
    .map(|(_, decoys)| ClsagPlaceholder {
      commitment_key_image: CompressedPoint::IDENTITY,
      responses: vec![[0; 32]; decoys.ring().len()],
      challenge: [0; 32],
    })
    .collect();

  let proofs = RctProofsPlaceholder {
    base: RctBase {
      rct_type: crate::ringct::RCT_TYPE_BULLETPROOF_PLUS,
      fee,
      encrypted_amounts,
      commitments,
    },
    clsags,
    pseudo_outs,
    bulletproof: crate::ringct::BulletproofPlaceholder(vec![]),
  };

  let transaction = Transaction::V2 { prefix, proofs: Some(proofs) };

  Ok(BuiltTransaction { transaction, output_openings, input_rings: selected_rings })
}

fn build_key_images_for_uniqueness(
  spend_scalar: Scalar,
  inputs: &[WalletOutput],
) -> Result<Vec<Input>, BuildError> {
  inputs
    .iter()
    .map(|input| {
      let key_image = spend_key_image(spend_scalar, input)?;
      Ok(Input::ToKey { amount: None, key_offsets: vec![], key_image: key_image.compress() })
    })
    .collect()
}

/// The key image for an input, via [`WalletOutput::key_image`].
fn spend_key_image(spend_scalar: Scalar, input: &WalletOutput) -> Result<Point, BuildError> {
  input.key_image(spend_scalar).ok_or(BuildError::InvalidInput)
}

fn integrated_payment_id(destinations: &[Destination]) -> Option<[u8; 8]> {
  destinations.iter().find_map(|d| match d.address.kind() {
    AddressType::Integrated(id) => Some(id),
    _ => None,
  })
}

fn planned_ecdh_for_payment_id(destinations: &[Destination], r: Scalar) -> Result<Point, BuildError> {
  let destination = destinations
    .iter()
    .find(|d| matches!(d.address.kind(), AddressType::Integrated(_)))
    .ok_or(BuildError::InvalidInput)?;
  let view = destination.address.view().decompress().ok_or(BuildError::InvalidInput)?;
  Ok(view * r)
}

fn xor_payment_id(id: [u8; 8], mask: [u8; 8]) -> [u8; 8] {
  let mut res = [0; 8];
  for i in 0 .. 8 {
    res[i] = id[i] ^ mask[i];
  }
  res
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn zero_inputs_produces_an_empty_uniqueness_set() {
    let result = build_key_images_for_uniqueness(Scalar::ZERO, &[]);
    assert_eq!(result.unwrap().len(), 0);
  }

  #[test]
  fn xor_payment_id_is_an_involution() {
    let id = [1, 2, 3, 4, 5, 6, 7, 8];
    let mask = [9, 8, 7, 6, 5, 4, 3, 2];
    let masked = xor_payment_id(id, mask);
    assert_eq!(xor_payment_id(masked, mask), id);
  }
}
