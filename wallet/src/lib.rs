#![doc = "Client-side Monero wallet functionality: key hierarchy and address derivation, view-key output scanning, UTXO/decoy selection, transaction construction, and an offline-signing export format."]
#![deny(missing_docs)]

pub mod decoys;
pub mod extra;
pub mod export;
pub mod output;
pub mod ring_signature;
pub mod ringct;
pub mod scan;
pub mod select;
pub mod send;
pub mod transaction;
pub mod view_pair;

pub use output::WalletOutput;
pub use scan::{GuaranteedScanner, ScanError, Scanner, Timelocked};
pub use view_pair::{GuaranteedViewPair, ViewPair};

use zeroize::Zeroizing;

use monero_wallet_primitives::{keccak256, Commitment, CompressedPoint, Point, Scalar};
use monero_wallet_io::VarInt;

use crate::ringct::EncryptedAmount;
use crate::transaction::Input;

/// The ECDH-derived quantities shared between a transaction's sender and an output's recipient:
/// the output's shared key, view tag, and the amount/mask/payment-ID masks derived from it.
///
/// Every quantity here is a hash of the shared secret under a distinct domain separator, so
/// recovering one doesn't leak the others, and a sender computing them while building a
/// transaction derives bit-identical values to a recipient scanning for it.
pub struct SharedKeyDerivations {
  /// The derived shared key `Hs(uniqueness || 8rA || o)` (or without `uniqueness` for
  /// non-guaranteed outputs).
  pub shared_key: Scalar,
  /// The derived view tag, the first byte of `Hs("view_tag" || ...)`, letting a scanner reject
  /// outputs that aren't theirs without computing the full shared key derivation.
  pub view_tag: u8,
}

impl SharedKeyDerivations {
  /// The uniqueness tag binding an output's shared key derivation to this specific transaction's
  /// inputs, closing the "burning bug" where a forged transaction with no real inputs could reuse
  /// a previously-seen shared key to present an output as a duplicate receipt.
  pub fn uniqueness(inputs: &[Input]) -> [u8; 32] {
    let mut buf = Vec::with_capacity(9 + (32 * inputs.len()));
    buf.extend(b"uniqueness");
    for input in inputs {
      match input {
        Input::ToKey { key_image, .. } => buf.extend(key_image.to_bytes()),
        Input::Gen(height) => {
          VarInt::write(height, &mut buf).expect("write to Vec<u8> is infallible")
        }
      }
    }
    keccak256(buf)
  }

  /// Derive the shared key and view tag for output `o`, given its ECDH shared secret `8 * ecdh`
  /// (already including the cofactor multiplication) and, for guaranteed outputs, the
  /// transaction's uniqueness tag.
  pub fn output_derivations(
    uniqueness: Option<[u8; 32]>,
    ecdh: Point,
    o: usize,
  ) -> Zeroizing<SharedKeyDerivations> {
    let ecdh = (ecdh * Scalar::from(8u64)).compress();

    let mut output_derivation = Vec::with_capacity(32 + 10);
    if let Some(uniqueness) = uniqueness {
      output_derivation.extend(uniqueness);
    }
    output_derivation.extend(ecdh.to_bytes());
    VarInt::write(&o, &mut output_derivation).expect("write to Vec<u8> is infallible");

    let view_tag = keccak256([b"view_tag".as_slice(), &output_derivation].concat())[0];
    let shared_key = Scalar::hash(&output_derivation);

    Zeroizing::new(SharedKeyDerivations { shared_key, view_tag })
  }

  /// The XOR mask recovering an encrypted 8-byte payment ID from a transaction's ECDH secret.
  pub fn payment_id_xor(ecdh: Point) -> [u8; 8] {
    let ecdh = (ecdh * Scalar::from(8u64)).compress();
    let hash = keccak256([ecdh.to_bytes().as_slice(), &[0x8d]].concat());
    let mut res = [0; 8];
    res.copy_from_slice(&hash[.. 8]);
    res
  }

  /// The mask blinding this output's Pedersen commitment, `Hs("commitment_mask" || shared_key)`.
  pub fn commitment_mask(&self) -> Scalar {
    Scalar::hash([b"commitment_mask".as_slice(), &self.shared_key.to_bytes()].concat())
  }

  /// Encrypt (or decrypt; XOR is an involution) an amount under the compact RingCT encoding.
  pub fn compact_amount_encryption(&self, amount: u64) -> [u8; 8] {
    let mask = keccak256([b"amount".as_slice(), &self.shared_key.to_bytes()].concat());
    let mut res = amount.to_le_bytes();
    for i in 0 .. 8 {
      res[i] ^= mask[i];
    }
    res
  }

  /// Recover the real amount and mask an output's commitment opens to, given its encrypted
  /// amount. Returns `None` if the derived commitment doesn't match `commitment`, which should be
  /// treated as "this isn't actually our output" rather than an error.
  pub fn decrypt(
    &self,
    encrypted_amount: &EncryptedAmount,
    commitment: CompressedPoint,
  ) -> Option<(Scalar, u64)> {
    let (mask, amount) = match encrypted_amount {
      EncryptedAmount::Original { mask: enc_mask, amount: enc_amount } => {
        let mask_shared_sec = Scalar::hash(self.shared_key.to_bytes());
        let mask_scalar = Scalar::read(&mut enc_mask.as_slice()).ok()?;
        let mask = mask_scalar - mask_shared_sec;

        let amount_shared_sec = Scalar::hash(mask_shared_sec.to_bytes());
        let amount_scalar = Scalar::read(&mut enc_amount.as_slice()).ok()?;
        let amount_scalar = amount_scalar - amount_shared_sec;
        let amount_bytes = amount_scalar.to_bytes();
        let mut amount_le = [0; 8];
        amount_le.copy_from_slice(&amount_bytes[.. 8]);
        (mask, u64::from_le_bytes(amount_le))
      }
      EncryptedAmount::Compact { amount: enc_amount } => {
        let mask = self.commitment_mask();
        let mut amount_bytes = *enc_amount;
        let xor_mask = keccak256([b"amount".as_slice(), &self.shared_key.to_bytes()].concat());
        for i in 0 .. 8 {
          amount_bytes[i] ^= xor_mask[i];
        }
        (mask, u64::from_le_bytes(amount_bytes))
      }
    };

    let recomputed = Commitment::new(mask, amount).compress();
    (recomputed == commitment).then_some((mask, amount))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn uniqueness_is_deterministic_over_key_images() {
    let inputs = vec![Input::ToKey {
      amount: None,
      key_offsets: vec![1, 2],
      key_image: CompressedPoint::G,
    }];
    assert_eq!(SharedKeyDerivations::uniqueness(&inputs), SharedKeyDerivations::uniqueness(&inputs));
  }

  #[test]
  fn compact_amount_encryption_is_an_involution() {
    let derivations = SharedKeyDerivations { shared_key: Scalar::from(42u64), view_tag: 0 };
    let amount = 123_456_789u64;
    let encrypted = derivations.compact_amount_encryption(amount);
    let decrypted_bytes = derivations.compact_amount_encryption(u64::from_le_bytes(encrypted));
    assert_eq!(u64::from_le_bytes(decrypted_bytes), amount);
  }

  #[test]
  fn decrypt_rejects_a_mismatched_commitment() {
    let derivations = SharedKeyDerivations { shared_key: Scalar::from(9u64), view_tag: 0 };
    let encrypted =
      EncryptedAmount::Compact { amount: derivations.compact_amount_encryption(500) };
    assert!(derivations.decrypt(&encrypted, CompressedPoint::IDENTITY).is_none());
  }
}
