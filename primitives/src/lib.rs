#![doc = "Ed25519 scalar/point newtypes, Pedersen commitments, and the Keccak-256 hash Monero uses throughout its protocol."]
#![deny(missing_docs)]

use sha3::{Digest, Keccak256};

mod scalar;
pub use scalar::Scalar;

mod point;
pub use point::Point;

mod compressed_point;
pub use compressed_point::CompressedPoint;

mod commitment;
pub use commitment::Commitment;

/// Monero's hash function: plain Keccak-256, not the later NIST SHA3-256 (which pads differently).
pub fn keccak256(data: impl AsRef<[u8]>) -> [u8; 32] {
  Keccak256::digest(data.as_ref()).into()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn keccak256_matches_known_vector() {
    // keccak256("") per the Keccak (not NIST SHA3-256) reference test vectors.
    let expected =
      hex_literal::hex!("c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470");
    assert_eq!(keccak256(b""), expected);
  }

  #[test]
  fn keccak256_is_deterministic() {
    assert_eq!(keccak256(b"monero"), keccak256(b"monero"));
    assert_ne!(keccak256(b"monero"), keccak256(b"monerO"));
  }
}
