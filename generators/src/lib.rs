#![doc = "Monero's `hash_to_point` function (Elligator 2 applied once to Curve25519) and the RingCT `H` generator derived from it."]
#![deny(missing_docs)]

use std::sync::LazyLock;

use curve25519_dalek::{
  constants::ED25519_BASEPOINT_POINT, edwards::CompressedEdwardsY, traits::IsIdentity,
  EdwardsPoint, MontgomeryPoint,
};
use sha3::{Digest, Keccak256};
use subtle::{Choice, ConditionallySelectable, ConstantTimeEq};

/// Sample a curve point from arbitrary bytes via Elligator 2, landing in the prime-order subgroup.
///
/// This achieves parity with Monero's `ge_fromfe_frombytes_vartime` /
/// `hash_to_ec`, which inlines a single application of Elligator 2 (Bernstein et al., "Elligator:
/// Elliptic-curve points indistinguishable from uniform random strings", <https://eprint.iacr.org/2013/325>,
/// §5.5) to Curve25519 and maps the result to Ed25519. Because Elligator 2 is only applied once,
/// the yielded points are biased to a subset of the curve; they remain usable as a deterministic,
/// unbiased-in-practice generator since nothing depends on sampling the *entire* curve uniformly.
pub fn hash_to_point(bytes: [u8; 32]) -> EdwardsPoint {
  use crypto_bigint::{const_residue, impl_modulus, modular::constant_mod::*, Encoding, U256};

  const MODULUS_STR: &str = "7fffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffed";
  impl_modulus!(FieldModulus, U256, MODULUS_STR);
  type Residue = self::Residue<FieldModulus, { U256::LIMBS }>;

  const A_U256: U256 = U256::from_u64(486_662);
  const A: Residue = const_residue!(A_U256, FieldModulus);
  const NEGATIVE_A: Residue = A.neg();

  let r = Residue::new(&U256::from_le_bytes(Keccak256::digest(bytes).into()));

  let r_square = r.square();
  let ur_square = r_square + r_square;

  let one_plus_ur_square = Residue::ONE + ur_square;
  let (one_plus_ur_square_inv, _was_zero) = one_plus_ur_square.invert();
  let upsilon = NEGATIVE_A * one_plus_ur_square_inv;
  let other_candidate = -upsilon - A;

  fn is_quadratic_residue_8_mod_5(value: &Residue) -> Choice {
    const SQRT_EXP: U256 = FieldModulus::MODULUS.shr_vartime(3).wrapping_add(&U256::ONE);
    const Z: Residue =
      Residue::ONE.add(&Residue::ONE).pow(&FieldModulus::MODULUS.shr_vartime(2));
    let y = value.pow(&SQRT_EXP);
    let alt = y * Z;
    y.square().ct_eq(value) | alt.square().ct_eq(value)
  }

  let epsilon = is_quadratic_residue_8_mod_5(&(((upsilon + A) * upsilon.square()) + upsilon));
  let u = Residue::conditional_select(&other_candidate, &upsilon, epsilon);

  let point = MontgomeryPoint(u.retrieve().to_le_bytes())
    .to_edwards(epsilon.unwrap_u8())
    .expect("neither Elligator 2 candidate was a square");

  point.mul_by_cofactor()
}

/// Whether a compressed point decompresses to a valid, non-identity, prime-order-subgroup point.
pub fn is_valid_point(bytes: [u8; 32]) -> bool {
  CompressedEdwardsY(bytes)
    .decompress()
    .filter(|p| p.compress().to_bytes() == bytes)
    .map(|p| (!p.is_identity()) && p.is_torsion_free())
    .unwrap_or(false)
}

static H_CELL: LazyLock<EdwardsPoint> = LazyLock::new(|| hash_to_point(ED25519_BASEPOINT_POINT.compress().to_bytes()));

/// The secondary Pedersen generator `H = 8 * hash_to_point(G)`, used to blind committed amounts.
pub fn h() -> EdwardsPoint {
  *H_CELL
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn h_is_deterministic_and_not_identity() {
    assert!(!h().is_identity());
    assert_eq!(h(), h());
  }

  #[test]
  fn hash_to_point_lands_in_prime_order_subgroup() {
    let p = hash_to_point([7; 32]);
    assert!(p.is_torsion_free());
  }
}
