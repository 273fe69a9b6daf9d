use std::io::{self, Read, Write};

use monero_wallet_io::{read_byte, read_bytes, read_vec, write_byte, write_vec};
use monero_wallet_primitives::CompressedPoint;

/// Monero's `RCTTypeBulletproofPlus` ordinal, the only RingCT type this library produces.
pub const RCT_TYPE_BULLETPROOF_PLUS: u8 = 6;

/// The lowest `rct_type` ordinal using the compact (8-byte XOR, no transmitted mask) encrypted
/// amount encoding, introduced alongside `RCTTypeBulletproof2`. Below this, amounts use the
/// original dual mask-and-amount encoding.
const RCT_TYPE_COMPACT_ECDH_THRESHOLD: u8 = 4;

/// An output's amount, encrypted so only the recipient (holding the ECDH shared secret) can
/// recover it.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum EncryptedAmount {
  /// The original RingCT encoding: both the commitment mask and the amount are individually
  /// masked by hash-derived scalars.
  Original {
    /// The masked commitment blinding factor.
    mask: [u8; 32],
    /// The masked amount, as a 32-byte scalar encoding.
    amount: [u8; 32],
  },
  /// The compact encoding introduced alongside Bulletproofs: the commitment mask is derived
  /// (not transmitted) and only an 8-byte XOR-masked amount is carried.
  Compact {
    /// The XOR-masked amount.
    amount: [u8; 8],
  },
}

impl EncryptedAmount {
  /// Write this encrypted amount.
  pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
    match self {
      EncryptedAmount::Original { mask, amount } => {
        w.write_all(mask)?;
        w.write_all(amount)
      }
      EncryptedAmount::Compact { amount } => w.write_all(amount),
    }
  }

  /// Read an encrypted amount, `compact` selecting which of the two on-wire shapes applies (it
  /// isn't self-describing; the containing `RctType` determines it).
  pub fn read<R: Read>(compact: bool, r: &mut R) -> io::Result<Self> {
    if compact {
      Ok(EncryptedAmount::Compact { amount: read_bytes(r)? })
    } else {
      Ok(EncryptedAmount::Original { mask: read_bytes(r)?, amount: read_bytes(r)? })
    }
  }
}

/// The non-proof portion of a RingCT transaction's cryptographic data: its type, fee, per-output
/// commitments, and their encrypted amounts.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct RctBase {
  /// The RingCT type ordinal (Monero's `RCTTypeXxx` byte), governing which wire shapes the
  /// surrounding proofs use. This library only produces [`RCT_TYPE_BULLETPROOF_PLUS`], but reads
  /// whatever a daemon or import sends.
  pub rct_type: u8,
  /// The transaction fee, committed to openly (not blinded).
  pub fee: u64,
  /// Each output's encrypted amount, in output order.
  pub encrypted_amounts: Vec<EncryptedAmount>,
  /// Each output's Pedersen commitment, in output order.
  pub commitments: Vec<CompressedPoint>,
}

/// A placeholder for a CLSAG ring signature's wire shape.
///
/// Producing a sound CLSAG requires constant-time scalar/point arithmetic matched exactly to
/// Monero's reference implementation; this library models the shape the wire format expects and
/// leaves filling in a verified signature to a dedicated signing backend.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ClsagPlaceholder {
  /// The ring's aggregate commitment key image component.
  pub commitment_key_image: CompressedPoint,
  /// The response scalars, one per ring member, encoded raw (not parsed as [`Scalar`](monero_wallet_primitives::Scalar) since placeholder values need not be canonical).
  pub responses: Vec<[u8; 32]>,
  /// The signature's single stored challenge.
  pub challenge: [u8; 32],
}

impl ClsagPlaceholder {
  fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
    self.commitment_key_image.write(w)?;
    write_vec(|r: &[u8; 32], w: &mut W| w.write_all(r), &self.responses, w)?;
    w.write_all(&self.challenge)
  }

  fn read<R: Read>(ring_len: usize, r: &mut R) -> io::Result<Self> {
    Ok(Self {
      commitment_key_image: CompressedPoint::read(r)?,
      responses: monero_wallet_io::read_raw_vec(read_bytes::<_, 32>, ring_len, r)?,
      challenge: read_bytes(r)?,
    })
  }
}

/// A placeholder for a Bulletproof+ range proof's wire shape: an opaque, already-serialized blob
/// (see [`crate::ringct::RctProofsPlaceholder`] for why this isn't a verified proof).
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct BulletproofPlaceholder(pub Vec<u8>);

/// The proof material accompanying a RingCT transaction's inputs and outputs: one CLSAG per
/// input and a single aggregate Bulletproof+ range proof.
///
/// This library does not implement sound range proof or ring signature generation; see
/// [`ClsagPlaceholder`] and [`BulletproofPlaceholder`]. A transaction built with this library is
/// correctly shaped but not independently verifiable until those proofs are supplied by a
/// dedicated proving backend.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct RctProofsPlaceholder {
  /// The transaction's base RingCT data.
  pub base: RctBase,
  /// One CLSAG per input, in input order.
  pub clsags: Vec<ClsagPlaceholder>,
  /// Each input's pseudo-output commitment (summing to the real output commitments plus fee).
  pub pseudo_outs: Vec<CompressedPoint>,
  /// The aggregate Bulletproof+ range proof over every output commitment.
  pub bulletproof: BulletproofPlaceholder,
}

impl RctProofsPlaceholder {
  /// Write these proofs.
  pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
    write_byte(&self.base.rct_type, w)?;
    monero_wallet_io::VarInt::write(&self.base.fee, w)?;
    for amount in &self.base.encrypted_amounts {
      amount.write(w)?;
    }
    for commitment in &self.base.commitments {
      commitment.write(w)?;
    }
    for pseudo_out in &self.pseudo_outs {
      pseudo_out.write(w)?;
    }
    for clsag in &self.clsags {
      clsag.write(w)?;
    }
    write_vec(|b: &u8, w: &mut W| monero_wallet_io::write_byte(b, w), &self.bulletproof.0, w)
  }

  /// Read these proofs, given the number of inputs and outputs the surrounding transaction
  /// declared.
  pub fn read<R: Read>(inputs: usize, outputs: usize, r: &mut R) -> io::Result<Self> {
    let rct_type = read_byte(r)?;
    let compact = rct_type >= RCT_TYPE_COMPACT_ECDH_THRESHOLD;
    let fee = monero_wallet_io::VarInt::read(r)?;
    let encrypted_amounts =
      monero_wallet_io::read_raw_vec(|r| EncryptedAmount::read(compact, r), outputs, r)?;
    let commitments = monero_wallet_io::read_raw_vec(CompressedPoint::read, outputs, r)?;
    let pseudo_outs = monero_wallet_io::read_raw_vec(CompressedPoint::read, inputs, r)?;
    let clsags =
      monero_wallet_io::read_raw_vec(|r| ClsagPlaceholder::read(inputs, r), inputs, r)?;
    let bulletproof = BulletproofPlaceholder(read_vec(monero_wallet_io::read_byte, None, r)?);
    Ok(Self {
      base: RctBase { rct_type, fee, encrypted_amounts, commitments },
      clsags,
      pseudo_outs,
      bulletproof,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn compact_encrypted_amount_round_trips() {
    let amount = EncryptedAmount::Compact { amount: [9; 8] };
    let mut buf = Vec::new();
    amount.write(&mut buf).unwrap();
    let read = EncryptedAmount::read(true, &mut buf.as_slice()).unwrap();
    assert_eq!(read, amount);
  }

  #[test]
  fn original_encrypted_amount_round_trips() {
    let amount = EncryptedAmount::Original { mask: [1; 32], amount: [2; 32] };
    let mut buf = Vec::new();
    amount.write(&mut buf).unwrap();
    let read = EncryptedAmount::read(false, &mut buf.as_slice()).unwrap();
    assert_eq!(read, amount);
  }

  #[test]
  fn proofs_write_the_rct_type_byte_first_and_round_trip() {
    let proofs = RctProofsPlaceholder {
      base: RctBase {
        rct_type: RCT_TYPE_BULLETPROOF_PLUS,
        fee: 1234,
        encrypted_amounts: vec![EncryptedAmount::Compact { amount: [7; 8] }],
        commitments: vec![CompressedPoint::G],
      },
      clsags: vec![ClsagPlaceholder {
        commitment_key_image: CompressedPoint::G,
        responses: vec![[3; 32]],
        challenge: [4; 32],
      }],
      pseudo_outs: vec![CompressedPoint::G],
      bulletproof: BulletproofPlaceholder(vec![1, 2, 3]),
    };

    let mut buf = Vec::new();
    proofs.write(&mut buf).unwrap();
    assert_eq!(buf[0], RCT_TYPE_BULLETPROOF_PLUS, "type byte must lead the non-proof framing");

    let read = RctProofsPlaceholder::read(1, 1, &mut buf.as_slice()).unwrap();
    assert_eq!(read, proofs);
  }

  #[test]
  fn a_pre_bulletproof2_rct_type_selects_the_original_ecdh_shape_on_read() {
    let proofs = RctProofsPlaceholder {
      base: RctBase {
        rct_type: 2, // RCTTypeSimple, predates the compact encoding
        fee: 10,
        encrypted_amounts: vec![EncryptedAmount::Original { mask: [1; 32], amount: [2; 32] }],
        commitments: vec![CompressedPoint::G],
      },
      clsags: vec![],
      pseudo_outs: vec![],
      bulletproof: BulletproofPlaceholder(vec![]),
    };

    let mut buf = Vec::new();
    proofs.write(&mut buf).unwrap();
    let read = RctProofsPlaceholder::read(0, 1, &mut buf.as_slice()).unwrap();
    assert_eq!(read, proofs);
  }
}
