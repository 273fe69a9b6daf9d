#![doc = "Monero's 25-word Electrum-style seed scheme: 32 bytes of entropy, the mnemonic that encodes them, and the private spend/view keys they derive."]
#![deny(missing_docs)]

mod mnemonic;
mod wordlist;

pub use mnemonic::MnemonicError;

use rand_core::{CryptoRng, RngCore};
use zeroize::{Zeroize, ZeroizeOnDrop};

use monero_wallet_primitives::{keccak256, Scalar};

/// 32 bytes of entropy, the root of a wallet's key hierarchy.
///
/// Never mutated after creation. Dropping a `Seed` zeroizes its bytes.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Seed([u8; 32]);

impl Seed {
  /// Generate a new seed from a cryptographically secure RNG.
  pub fn random(rng: &mut (impl RngCore + CryptoRng)) -> Self {
    let mut entropy = [0; 32];
    rng.fill_bytes(&mut entropy);
    Self(entropy)
  }

  /// Wrap existing entropy as a seed, e.g. one recovered from a mnemonic.
  pub fn from_entropy(entropy: [u8; 32]) -> Self {
    Self(entropy)
  }

  /// This seed's raw entropy.
  pub fn entropy(&self) -> [u8; 32] {
    self.0
  }

  /// Encode this seed as its 25-word mnemonic.
  pub fn to_mnemonic(&self) -> Vec<String> {
    mnemonic::encode(self.0)
  }

  /// Decode a 25-word mnemonic back to a seed, rejecting an invalid checksum or unknown word.
  pub fn from_mnemonic(words: &[String]) -> Result<Self, MnemonicError> {
    mnemonic::decode(words).map(Self)
  }

  /// Derive this seed's private spend and view keys: `(spend, view)`.
  ///
  /// `spend = scalar_reduce(seed ‖ 0^32)`, `view = scalar_reduce(keccak256(spend) ‖ 0^32)`.
  pub fn keys(&self) -> (Scalar, Scalar) {
    let mut wide = [0u8; 64];
    wide[.. 32].copy_from_slice(&self.0);
    let spend = Scalar::reduce(wide);

    let mut wide = [0u8; 64];
    wide[.. 32].copy_from_slice(&keccak256(spend.to_bytes()));
    let view = Scalar::reduce(wide);

    (spend, view)
  }
}

#[cfg(test)]
mod tests {
  use rand_chacha::{rand_core::SeedableRng, ChaCha20Rng};

  use super::*;

  #[test]
  fn mnemonic_round_trips_through_a_seed() {
    let mut rng = ChaCha20Rng::seed_from_u64(1);
    let seed = Seed::random(&mut rng);
    let words = seed.to_mnemonic();
    let recovered = Seed::from_mnemonic(&words).unwrap();
    assert_eq!(recovered.entropy(), seed.entropy());
  }

  #[test]
  fn keys_are_deterministic_given_the_same_seed() {
    let seed = Seed::from_entropy([3; 32]);
    let (spend_a, view_a) = seed.keys();
    let (spend_b, view_b) = seed.keys();
    assert_eq!(spend_a, spend_b);
    assert_eq!(view_a, view_b);
    assert_ne!(spend_a, view_a);
  }
}
