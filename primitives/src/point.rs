use curve25519_dalek::{traits::IsIdentity, EdwardsPoint};

use monero_wallet_generators::hash_to_point;

use crate::{CompressedPoint, Scalar};

/// An Edwards point already known to lie in the prime-order subgroup.
#[derive(Clone, Copy, Debug)]
pub struct Point(EdwardsPoint);

impl PartialEq for Point {
  fn eq(&self, other: &Self) -> bool {
    self.0 == other.0
  }
}
impl Eq for Point {}

impl Point {
  /// Wrap a point already confirmed to be torsion-free. Not exposed outside this crate; callers
  /// must go through `CompressedPoint::decompress`.
  pub(crate) fn from_torsion_free(point: EdwardsPoint) -> Option<Self> {
    point.is_torsion_free().then_some(Self(point))
  }

  pub(crate) fn inner(&self) -> EdwardsPoint {
    self.0
  }

  /// Compress this point.
  pub fn compress(&self) -> CompressedPoint {
    CompressedPoint::from(*self)
  }

  /// Hash arbitrary bytes to a point in the prime-order subgroup, via a single application of
  /// Elligator 2 followed by cofactor clearing.
  pub fn hash_to_point(bytes: [u8; 32]) -> Self {
    Self(hash_to_point(bytes))
  }

  /// Derive the key image `x * Hp(P)` for a one-time output key `P` with spend scalar `x`.
  ///
  /// `hashed_output_key` must be `Point::hash_to_point(P.compress().to_bytes())`.
  pub fn key_image(x: Scalar, hashed_output_key: Point) -> Point {
    Self(hashed_output_key.0 * x.dalek())
  }

  /// Whether this is the identity element.
  pub fn is_identity(&self) -> bool {
    self.0.is_identity()
  }
}

impl core::ops::Add for Point {
  type Output = Point;
  fn add(self, rhs: Point) -> Point {
    Self(self.0 + rhs.0)
  }
}
impl core::ops::Mul<Scalar> for Point {
  type Output = Point;
  fn mul(self, rhs: Scalar) -> Point {
    Self(self.0 * rhs.dalek())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn hash_to_point_is_torsion_free() {
    let p = Point::hash_to_point([9; 32]);
    assert!(!p.is_identity());
  }

  #[test]
  fn key_image_is_deterministic() {
    let x = Scalar::from(42u64);
    let base = Point::hash_to_point([1; 32]);
    assert_eq!(Point::key_image(x, base), Point::key_image(x, base));
  }
}
