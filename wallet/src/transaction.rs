use std::cmp::Ordering;
use std::io::{self, Read, Write};

use monero_wallet_io::{read_byte, read_vec, write_byte, write_vec, VarInt};
use monero_wallet_primitives::{keccak256, CompressedPoint};

use crate::extra::Extra;
use crate::ring_signature::RingSignature;
use crate::ringct::RctProofsPlaceholder;

const INPUT_GEN_MARKER: u8 = 255;
const INPUT_TO_KEY_MARKER: u8 = 2;

/// A transaction's single spent output, or the coinbase marker.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Input {
  /// A miner transaction's sole input, carrying the block height it was mined at (bound into the
  /// coinbase output's uniqueness tag, since miner transactions have no key image to bind to).
  Gen(usize),
  /// A transaction input spending a prior output via a ring signature over decoys.
  ToKey {
    /// The spent amount, only present (and only meaningful) for pre-RingCT transactions.
    amount: Option<u64>,
    /// The ring's members, as offsets from the previous member's global output index (the first
    /// is absolute). Decoding requires an unrolling running sum.
    key_offsets: Vec<u64>,
    /// The spent output's key image, preventing it from being spent twice.
    key_image: CompressedPoint,
  },
}

impl Input {
  /// Write this input.
  pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
    match self {
      Input::Gen(height) => {
        write_byte(&INPUT_GEN_MARKER, w)?;
        VarInt::write(height, w)
      }
      Input::ToKey { amount, key_offsets, key_image } => {
        write_byte(&INPUT_TO_KEY_MARKER, w)?;
        VarInt::write(&amount.unwrap_or(0), w)?;
        write_vec(VarInt::write, key_offsets, w)?;
        key_image.write(w)
      }
    }
  }

  /// Read an input. `rct` must reflect whether the containing transaction is a RingCT (version 2)
  /// transaction, since a `ToKey` input only carries an amount when it isn't.
  pub fn read<R: Read>(rct: bool, r: &mut R) -> io::Result<Self> {
    match read_byte(r)? {
      INPUT_GEN_MARKER => Ok(Input::Gen(VarInt::read(r)?)),
      INPUT_TO_KEY_MARKER => {
        let amount: u64 = VarInt::read(r)?;
        if rct && (amount != 0) {
          return Err(io::Error::other("RingCT transaction had a ToKey input with a set amount"));
        }
        Ok(Input::ToKey {
          amount: (amount != 0).then_some(amount),
          key_offsets: read_vec(VarInt::read, None, r)?,
          key_image: CompressedPoint::read(r)?,
        })
      }
      _ => Err(io::Error::other("unrecognized input marker")),
    }
  }
}

const OUTPUT_NO_VIEW_TAG_MARKER: u8 = 2;
const OUTPUT_VIEW_TAG_MARKER: u8 = 3;

/// A transaction's single created output.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Output {
  /// The output's amount, only present (and only meaningful) for pre-RingCT transactions.
  pub amount: Option<u64>,
  /// The output's one-time public key.
  pub key: CompressedPoint,
  /// The view tag accelerating scan rejection, present from the Bulletproof+ hardfork onward.
  pub view_tag: Option<u8>,
}

impl Output {
  /// Write this output.
  pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
    VarInt::write(&self.amount.unwrap_or(0), w)?;
    write_byte(&if self.view_tag.is_some() { OUTPUT_VIEW_TAG_MARKER } else { OUTPUT_NO_VIEW_TAG_MARKER }, w)?;
    self.key.write(w)?;
    if let Some(view_tag) = self.view_tag {
      write_byte(&view_tag, w)?;
    }
    Ok(())
  }

  /// Read an output. `rct` must reflect whether the containing transaction is RingCT, since a
  /// RingCT output's amount must be the sentinel zero (the real amount being carried, encrypted,
  /// in the transaction's RingCT proofs instead).
  pub fn read<R: Read>(rct: bool, r: &mut R) -> io::Result<Self> {
    let amount: u64 = VarInt::read(r)?;
    if rct && (amount != 0) {
      return Err(io::Error::other("RingCT transaction had an output with a set amount"));
    }
    let marker = read_byte(r)?;
    let view_tag = match marker {
      OUTPUT_NO_VIEW_TAG_MARKER => false,
      OUTPUT_VIEW_TAG_MARKER => true,
      _ => return Err(io::Error::other("unrecognized output marker")),
    };
    let key = CompressedPoint::read(r)?;
    let view_tag = view_tag.then(|| read_byte(r)).transpose()?;
    Ok(Self { amount: (amount != 0).then_some(amount), key, view_tag })
  }
}

/// The point, in Unix time, past which block-height timelocks are assumed to actually encode a
/// Unix timestamp instead (Monero's chain will never reach this height at one block/~2min).
const TIMELOCK_BLOCK_VS_TIME_THRESHOLD: usize = 500_000_000;

/// A point up to which an output (or an entire transaction) cannot be spent.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum Timelock {
  /// No timelock.
  #[default]
  None,
  /// Unlocked once the chain reaches this block height.
  Block(usize),
  /// Unlocked once the chain's median timestamp passes this Unix time.
  Time(u64),
}

impl PartialOrd for Timelock {
  /// `None` orders before everything else. Two `Block` locks, or two `Time` locks, are
  /// comparable; a `Block` lock and a `Time` lock are not (there's no fixed conversion between
  /// block height and wall-clock time), so this deliberately returns `None` for that pairing.
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    match (self, other) {
      (Timelock::None, Timelock::None) => Some(Ordering::Equal),
      (Timelock::None, _) => Some(Ordering::Less),
      (_, Timelock::None) => Some(Ordering::Greater),
      (Timelock::Block(a), Timelock::Block(b)) => a.partial_cmp(b),
      (Timelock::Time(a), Timelock::Time(b)) => a.partial_cmp(b),
      _ => None,
    }
  }
}

impl Timelock {
  /// Write this timelock.
  pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
    match self {
      Timelock::None => VarInt::write(&0u8, w),
      Timelock::Block(block) => VarInt::write(block, w),
      Timelock::Time(time) => VarInt::write(time, w),
    }
  }

  /// Read a timelock.
  pub fn read<R: Read>(r: &mut R) -> io::Result<Self> {
    let raw: usize = VarInt::read(r)?;
    Ok(if raw == 0 {
      Timelock::None
    } else if raw < TIMELOCK_BLOCK_VS_TIME_THRESHOLD {
      Timelock::Block(raw)
    } else {
      Timelock::Time(raw as u64)
    })
  }

  /// Whether this timelock permits spending at `height` with median timestamp `time`.
  pub fn satisfied_by(&self, height: usize, time: u64) -> bool {
    match self {
      Timelock::None => true,
      Timelock::Block(block) => height >= *block,
      Timelock::Time(unlock_time) => time >= *unlock_time,
    }
  }
}

/// The portion of a transaction common to both its pruned and full representations: its inputs,
/// outputs, timelock, and `extra` field.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct TransactionPrefix {
  /// The transaction's default unlock time.
  pub additional_timelock: Timelock,
  /// The transaction's inputs.
  pub inputs: Vec<Input>,
  /// The transaction's outputs.
  pub outputs: Vec<Output>,
  /// The raw, unparsed `extra` field. Use [`Extra::read`] to parse it.
  pub extra: Vec<u8>,
}

impl TransactionPrefix {
  /// Write this prefix.
  pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
    self.additional_timelock.write(w)?;
    write_vec(|i: &Input, w: &mut W| i.write(w), &self.inputs, w)?;
    write_vec(|o: &Output, w: &mut W| o.write(w), &self.outputs, w)?;
    VarInt::write(&self.extra.len(), w)?;
    w.write_all(&self.extra)
  }

  /// Read a prefix. `version` determines whether inputs/outputs are parsed under RingCT rules.
  pub fn read<R: Read>(r: &mut R, version: u64) -> io::Result<Self> {
    let rct = version == 2;
    let additional_timelock = Timelock::read(r)?;
    let inputs = read_vec(|r| Input::read(rct, r), None, r)?;
    let outputs = read_vec(|r| Output::read(rct, r), None, r)?;
    let extra_len: usize = VarInt::read(r)?;
    let mut extra = vec![0; extra_len];
    r.read_exact(&mut extra)?;
    Ok(Self { additional_timelock, inputs, outputs, extra })
  }

  /// This transaction's parsed `extra` field.
  pub fn parsed_extra(&self) -> io::Result<Extra> {
    Extra::read(&mut self.extra.as_slice())
  }

  /// The transaction prefix's hash, as used in the full transaction hash and (for RingCT
  /// transactions) the CLSAG signature message.
  pub fn hash(&self, version: u64) -> [u8; 32] {
    let mut buf = Vec::new();
    VarInt::write(&version, &mut buf).expect("write to Vec<u8> is infallible");
    self.write(&mut buf).expect("write to Vec<u8> is infallible");
    keccak256(buf)
  }
}

/// A transaction, version 1 (pre-RingCT) or version 2 (RingCT).
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Transaction {
  /// A pre-RingCT transaction, with one legacy ring signature per input.
  V1 {
    /// The transaction's prefix.
    prefix: TransactionPrefix,
    /// One ring signature per input, in input order.
    signatures: Vec<RingSignature>,
  },
  /// A RingCT transaction. `proofs` is `None` only for a miner (coinbase) transaction, which
  /// has no commitments or signatures to prove.
  V2 {
    /// The transaction's prefix.
    prefix: TransactionPrefix,
    /// The transaction's RingCT proofs, absent only for miner transactions.
    proofs: Option<RctProofsPlaceholder>,
  },
}

impl Transaction {
  /// This transaction's prefix.
  pub fn prefix(&self) -> &TransactionPrefix {
    match self {
      Transaction::V1 { prefix, .. } | Transaction::V2 { prefix, .. } => prefix,
    }
  }

  fn version(&self) -> u64 {
    match self {
      Transaction::V1 { .. } => 1,
      Transaction::V2 { .. } => 2,
    }
  }

  /// Write this transaction.
  pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
    VarInt::write(&self.version(), w)?;
    match self {
      Transaction::V1 { prefix, signatures } => {
        prefix.write(w)?;
        for signature in signatures {
          signature.write(w)?;
        }
      }
      Transaction::V2 { prefix, proofs } => {
        prefix.write(w)?;
        if let Some(proofs) = proofs {
          proofs.write(w)?;
        }
      }
    }
    Ok(())
  }

  /// Read a transaction.
  pub fn read<R: Read>(r: &mut R) -> io::Result<Self> {
    let version: u64 = VarInt::read(r)?;
    match version {
      1 => {
        let prefix = TransactionPrefix::read(r, version)?;
        let signatures = prefix
          .inputs
          .iter()
          .map(|input| match input {
            Input::ToKey { key_offsets, .. } => RingSignature::read(key_offsets.len(), r),
            Input::Gen(_) => RingSignature::read(0, r),
          })
          .collect::<io::Result<_>>()?;
        Ok(Transaction::V1 { prefix, signatures })
      }
      2 => {
        let prefix = TransactionPrefix::read(r, version)?;
        let is_miner_tx = matches!(prefix.inputs.first(), Some(Input::Gen(_)));
        let proofs = if is_miner_tx {
          None
        } else {
          let inputs = prefix.inputs.len();
          let outputs = prefix.outputs.len();
          Some(RctProofsPlaceholder::read(inputs, outputs, r)?)
        };
        Ok(Transaction::V2 { prefix, proofs })
      }
      _ => Err(io::Error::other("unrecognized transaction version")),
    }
  }

  /// This transaction's hash, as referenced throughout the protocol (block transaction lists,
  /// key images' spent-output lookups, `send_raw_transaction`).
  pub fn hash(&self) -> [u8; 32] {
    let mut buf = Vec::new();
    self.write(&mut buf).expect("write to Vec<u8> is infallible");
    keccak256(buf)
  }

  /// The hash CLSAGs sign over: the prefix hash bound to the RingCT proofs' non-signature
  /// material, preventing a signature from being replayed against a mutated proof set. `None` for
  /// a miner transaction, which has no signatures to produce this for.
  pub fn signature_hash(&self) -> Option<[u8; 32]> {
    match self {
      Transaction::V1 { .. } => None,
      Transaction::V2 { prefix, proofs: Some(proofs) } => {
        let mut buf = Vec::new();
        buf.extend(prefix.hash(2));
        let mut base_buf = Vec::new();
        proofs.write(&mut base_buf).expect("write to Vec<u8> is infallible");
        buf.extend(keccak256(base_buf));
        Some(keccak256(buf))
      }
      Transaction::V2 { proofs: None, .. } => None,
    }
  }

  /// This transaction's serialized byte length, the basis for fee calculation.
  pub fn weight(&self) -> usize {
    let mut buf = Vec::new();
    self.write(&mut buf).expect("write to Vec<u8> is infallible");
    buf.len()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn sample_prefix() -> TransactionPrefix {
    TransactionPrefix {
      additional_timelock: Timelock::None,
      inputs: vec![Input::ToKey {
        amount: None,
        key_offsets: vec![5, 3, 100],
        key_image: CompressedPoint::G,
      }],
      outputs: vec![Output { amount: None, key: CompressedPoint::G, view_tag: Some(7) }],
      extra: vec![1, 2, 3],
    }
  }

  #[test]
  fn prefix_round_trips() {
    let prefix = sample_prefix();
    let mut buf = Vec::new();
    prefix.write(&mut buf).unwrap();
    let read = TransactionPrefix::read(&mut buf.as_slice(), 2).unwrap();
    assert_eq!(read, prefix);
  }

  #[test]
  fn timelock_block_vs_time_threshold() {
    assert_eq!(Timelock::Block(100).partial_cmp(&Timelock::Time(100)), None);
    assert!(Timelock::None < Timelock::Block(1));
  }

  #[test]
  fn timelock_round_trips_both_kinds() {
    for timelock in [Timelock::None, Timelock::Block(1_000), Timelock::Time(1_700_000_000)] {
      let mut buf = Vec::new();
      timelock.write(&mut buf).unwrap();
      assert_eq!(Timelock::read(&mut buf.as_slice()).unwrap(), timelock);
    }
  }

  #[test]
  fn miner_transaction_has_no_proofs() {
    let prefix = TransactionPrefix {
      additional_timelock: Timelock::None,
      inputs: vec![Input::Gen(1_000)],
      outputs: vec![Output { amount: Some(600_000_000_000), key: CompressedPoint::G, view_tag: None }],
      extra: vec![],
    };
    let tx = Transaction::V2 { prefix, proofs: None };
    let mut buf = Vec::new();
    tx.write(&mut buf).unwrap();
    let read = Transaction::read(&mut buf.as_slice()).unwrap();
    assert_eq!(read, tx);
    assert_eq!(read.signature_hash(), None);
  }
}
