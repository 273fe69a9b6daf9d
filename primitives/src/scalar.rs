use std::io::{self, Read, Write};
use std::ops::DerefMut;

use rand_core::{CryptoRng, RngCore};
use sha3::{Digest, Keccak256};
use subtle::{Choice, ConstantTimeEq};
use zeroize::{Zeroize, Zeroizing};

use monero_wallet_io::read_bytes;

/// A scalar modulo Ed25519's group order `l`, canonically encoded.
#[derive(Clone, Copy, Eq, Debug, Zeroize)]
pub struct Scalar([u8; 32]);

impl ConstantTimeEq for Scalar {
  fn ct_eq(&self, other: &Self) -> Choice {
    self.0.ct_eq(&other.0)
  }
}
impl PartialEq for Scalar {
  fn eq(&self, other: &Self) -> bool {
    bool::from(self.ct_eq(other))
  }
}

impl Scalar {
  /// The additive identity.
  pub const ZERO: Self = Self([0; 32]);
  /// The multiplicative identity.
  #[rustfmt::skip]
  pub const ONE: Self = Self([
    1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
  ]);

  /// Write this scalar.
  pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
    w.write_all(&self.0)
  }

  /// Serialize this scalar.
  pub fn to_bytes(self) -> [u8; 32] {
    self.0
  }

  /// Read a canonically-encoded scalar, rejecting any value `>= l`.
  pub fn read<R: Read>(r: &mut R) -> io::Result<Scalar> {
    let bytes = read_bytes(r)?;
    Option::<curve25519_dalek::Scalar>::from(curve25519_dalek::Scalar::from_canonical_bytes(bytes))
      .ok_or_else(|| io::Error::other("unreduced scalar"))?;
    Ok(Self(bytes))
  }

  /// Reduce 64 bytes modulo `l` via a wide (bias-free) reduction.
  pub fn reduce(bytes: [u8; 64]) -> Self {
    Self(curve25519_dalek::Scalar::from_bytes_mod_order_wide(&bytes).to_bytes())
  }

  /// Sample a uniform scalar.
  pub fn random(rng: &mut (impl RngCore + CryptoRng)) -> Self {
    let mut raw = Zeroizing::new([0u8; 64]);
    rng.fill_bytes(raw.deref_mut());
    Self::reduce(*raw)
  }

  /// `keccak256(data) mod l`. This is NOT a wide reduction, matching Monero's `Hs`.
  ///
  /// Panics if the digest happens to be a multiple of `l`; this has negligible probability and
  /// matches Monero's own behavior of refusing to use a zero challenge/offset.
  pub fn hash(data: impl AsRef<[u8]>) -> Self {
    let scalar =
      curve25519_dalek::Scalar::from_bytes_mod_order(Keccak256::digest(data.as_ref()).into());
    assert!(scalar != curve25519_dalek::Scalar::ZERO, "Hs(preimage) was congruent to 0 mod l");
    Self(scalar.to_bytes())
  }

  pub(crate) fn dalek(self) -> curve25519_dalek::Scalar {
    curve25519_dalek::Scalar::from_canonical_bytes(self.0)
      .expect("Scalar invariant violated: non-canonical bytes stored")
  }

  pub(crate) fn from_dalek(scalar: curve25519_dalek::Scalar) -> Self {
    Self(scalar.to_bytes())
  }
}

impl core::ops::Add for Scalar {
  type Output = Scalar;
  fn add(self, rhs: Scalar) -> Scalar {
    Self::from_dalek(self.dalek() + rhs.dalek())
  }
}
impl core::ops::Sub for Scalar {
  type Output = Scalar;
  fn sub(self, rhs: Scalar) -> Scalar {
    Self::from_dalek(self.dalek() - rhs.dalek())
  }
}
impl core::ops::Mul for Scalar {
  type Output = Scalar;
  fn mul(self, rhs: Scalar) -> Scalar {
    Self::from_dalek(self.dalek() * rhs.dalek())
  }
}

impl From<u64> for Scalar {
  fn from(value: u64) -> Self {
    Self::from_dalek(curve25519_dalek::Scalar::from(value))
  }
}

impl From<Scalar> for [u8; 32] {
  fn from(scalar: Scalar) -> [u8; 32] {
    scalar.0
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn add_sub_roundtrip() {
    let a = Scalar::from(5u64);
    let b = Scalar::from(3u64);
    assert_eq!((a + b) - b, a);
  }

  #[test]
  fn reduce_is_reduce_mod_l() {
    let zero = Scalar::reduce([0u8; 64]);
    assert_eq!(zero, Scalar::ZERO);
  }
}
