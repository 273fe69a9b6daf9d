use std::io::{self, Read, Write};

use curve25519_dalek::{
  constants::ED25519_BASEPOINT_POINT, scalar::Scalar as DalekScalar, traits::MultiscalarMul,
  EdwardsPoint,
};

use monero_wallet_generators::h;

use crate::{CompressedPoint, Scalar};

/// A Pedersen commitment `C = mask * G + amount * H` to an amount, blinded by a mask.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Commitment {
  /// The blinding factor.
  pub mask: Scalar,
  /// The committed amount.
  pub amount: u64,
}

impl Commitment {
  /// A commitment to 0 with a mask of 1, matching the convention Monero uses for transaction fees
  /// (which are committed to openly, not blinded).
  pub fn zero() -> Self {
    Self { mask: Scalar::ONE, amount: 0 }
  }

  /// Build a commitment from a mask and an amount.
  pub fn new(mask: Scalar, amount: u64) -> Self {
    Self { mask, amount }
  }

  /// Compute `mask * G + amount * H`.
  pub fn calculate(&self) -> EdwardsPoint {
    EdwardsPoint::multiscalar_mul(
      [self.mask.dalek(), DalekScalar::from(self.amount)],
      [ED25519_BASEPOINT_POINT, h()],
    )
  }

  /// Compress the computed commitment.
  pub fn compress(&self) -> CompressedPoint {
    CompressedPoint::from_bytes(self.calculate().compress().to_bytes())
  }

  /// Serialize the mask and amount. This is not a Monero wire format; it exists purely for
  /// wallet-local persistence of unblinded commitment openings.
  pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
    self.mask.write(w)?;
    w.write_all(&self.amount.to_le_bytes())
  }

  /// Read back a commitment opening written by `write`.
  pub fn read<R: Read>(r: &mut R) -> io::Result<Self> {
    let mask = Scalar::read(r)?;
    let mut amount_bytes = [0; 8];
    r.read_exact(&mut amount_bytes)?;
    Ok(Self { mask, amount: u64::from_le_bytes(amount_bytes) })
  }
}

impl core::ops::Add for Commitment {
  type Output = Commitment;
  fn add(self, rhs: Commitment) -> Commitment {
    Self { mask: self.mask + rhs.mask, amount: self.amount.wrapping_add(rhs.amount) }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn zero_commitment_uses_mask_one() {
    assert_eq!(Commitment::zero().mask, Scalar::ONE);
    assert_eq!(Commitment::zero().amount, 0);
  }

  #[test]
  fn write_read_round_trip() {
    let c = Commitment::new(Scalar::from(7u64), 12345);
    let mut buf = Vec::new();
    c.write(&mut buf).unwrap();
    let read = Commitment::read(&mut buf.as_slice()).unwrap();
    assert_eq!(read, c);
  }

  #[test]
  fn commitment_is_additively_homomorphic() {
    let a = Commitment::new(Scalar::from(3u64), 100);
    let b = Commitment::new(Scalar::from(4u64), 200);
    let sum = a + b;
    assert_eq!(sum.compress(), Commitment::new(Scalar::from(7u64), 300).compress());
  }
}
