use std::io::{self, Read, Write};

use curve25519_dalek::edwards::CompressedEdwardsY;

use monero_wallet_io::read_bytes;

use crate::Point;

/// A compressed (32-byte) Edwards point, not yet checked for canonicity or curve membership.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct CompressedPoint([u8; 32]);

impl CompressedPoint {
  /// The identity element, compressed.
  pub const IDENTITY: Self = Self([
    1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
  ]);

  /// The Ed25519 basepoint `G`, compressed.
  #[rustfmt::skip]
  pub const G: Self = Self([
    0x58, 0x66, 0x66, 0x66, 0x66, 0x66, 0x66, 0x66, 0x66, 0x66, 0x66, 0x66, 0x66, 0x66, 0x66, 0x66,
    0x66, 0x66, 0x66, 0x66, 0x66, 0x66, 0x66, 0x66, 0x66, 0x66, 0x66, 0x66, 0x66, 0x66, 0x66, 0x66,
  ]);

  /// The secondary Pedersen generator `H = 8 * hash_to_point(G)`.
  #[rustfmt::skip]
  pub const H: Self = Self([
    139, 101, 89, 112, 21, 55, 153, 175, 42, 234, 220, 159, 241, 173, 208, 234,
    108, 114, 81, 213, 65, 84, 207, 169, 44, 23, 58, 13, 211, 156, 31, 148,
  ]);

  /// View the underlying bytes.
  pub fn to_bytes(self) -> [u8; 32] {
    self.0
  }

  /// Wrap an arbitrary byte string, without checking it decompresses.
  pub fn from_bytes(bytes: [u8; 32]) -> Self {
    Self(bytes)
  }

  /// Write the compressed point.
  pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
    w.write_all(&self.0)
  }

  /// Read 32 bytes without attempting to decompress them.
  pub fn read<R: Read>(r: &mut R) -> io::Result<Self> {
    Ok(Self(read_bytes(r)?))
  }

  /// Decompress, rejecting non-canonical encodings and points outside the prime-order subgroup.
  pub fn decompress(&self) -> Option<Point> {
    let point = CompressedEdwardsY(self.0).decompress()?;
    if point.compress().to_bytes() != self.0 {
      return None;
    }
    Point::from_torsion_free(point)
  }
}

impl From<Point> for CompressedPoint {
  fn from(point: Point) -> Self {
    Self(point.inner().compress().to_bytes())
  }
}

#[cfg(test)]
mod tests {
  use curve25519_dalek::constants::ED25519_BASEPOINT_POINT;

  use super::*;

  #[test]
  fn g_decompresses_to_the_basepoint() {
    let g = CompressedPoint::G.decompress().expect("G must decompress");
    assert_eq!(g.inner(), ED25519_BASEPOINT_POINT);
  }

  #[test]
  fn identity_round_trips() {
    let mut buf = Vec::new();
    CompressedPoint::IDENTITY.write(&mut buf).unwrap();
    let read = CompressedPoint::read(&mut buf.as_slice()).unwrap();
    assert_eq!(read, CompressedPoint::IDENTITY);
  }
}
