use zeroize::Zeroizing;

use monero_wallet_address::SubaddressIndex;
use monero_wallet_primitives::{keccak256, CompressedPoint, Point, Scalar};

fn basepoint() -> Point {
  CompressedPoint::G.decompress().expect("G must decompress")
}

/// The `keccak256("SubAddr\0" || priv_view || major_le32 || minor_le32)` scalar binding a
/// subaddress index to a view key, per Monero's subaddress derivation.
fn subaddress_derivation_scalar(view: &Scalar, index: SubaddressIndex) -> Scalar {
  let mut buf = Vec::with_capacity(8 + 32 + 4 + 4);
  buf.extend(b"SubAddr\0");
  buf.extend(view.to_bytes());
  buf.extend(index.major().to_le_bytes());
  buf.extend(index.minor().to_le_bytes());
  Scalar::hash(buf)
}

/// The view key and public spend key a watch-only or hot wallet scans with.
///
/// Holds the private view key, letting its owner decrypt which outputs among those sent to the
/// associated spend key belong to them, recover amounts, and (for subaddresses) derive the
/// matching subaddress spend keys. It does not hold the private spend key, so it cannot spend.
#[derive(Clone)]
pub struct ViewPair {
  spend: CompressedPoint,
  /// The private view key.
  pub(crate) view: Zeroizing<Scalar>,
}

impl ViewPair {
  /// Build a view pair from a public spend key and a private view key.
  pub fn new(spend: CompressedPoint, view: Zeroizing<Scalar>) -> Self {
    Self { spend, view }
  }

  /// The public spend key.
  pub fn spend(&self) -> Point {
    spend_point(self.spend)
  }

  /// The compressed public spend key.
  pub fn spend_compressed(&self) -> CompressedPoint {
    self.spend
  }

  /// The private view key.
  pub fn view(&self) -> Scalar {
    *self.view
  }

  /// The subaddress's public spend and view keys, `(B + D*G, v*(B + D*G))` where `D` is the
  /// subaddress derivation scalar. The primary address (`(0, 0)`) is returned unmodified, per
  /// Monero convention of not re-deriving the primary address as a subaddress.
  pub fn subaddress_keys(&self, index: SubaddressIndex) -> (CompressedPoint, CompressedPoint) {
    if index.is_primary() {
      return (self.spend, (self.spend() * self.view()).compress());
    }
    let derivation = subaddress_derivation_scalar(&self.view, index);
    let spend = self.spend() + (basepoint() * derivation);
    let view = spend * self.view();
    (spend.compress(), view.compress())
  }

  /// The scalar offset a subaddress's one-time output keys carry relative to the primary spend
  /// key's offset, i.e. `D` from `subaddress_keys`. The primary address has no offset.
  pub fn subaddress_derivation(&self, index: SubaddressIndex) -> Scalar {
    if index.is_primary() {
      return Scalar::ZERO;
    }
    subaddress_derivation_scalar(&self.view, index)
  }
}

fn spend_point(spend: CompressedPoint) -> Point {
  spend.decompress().expect("ViewPair constructed with a spend key off the curve")
}

/// A [`ViewPair`] which only ever receives "guaranteed" outputs: those bound to the sender's
/// spend key via a uniqueness tag over the transaction's key images, closing Monero's
/// "burning bug" (a spent output's amount commitment getting silently reused by an attacker to
/// forge an additional, unspendable-looking receipt). Scanning with this pair rejects any output
/// not using the guaranteed derivation.
#[derive(Clone)]
pub struct GuaranteedViewPair(pub(crate) ViewPair);

impl GuaranteedViewPair {
  /// Wrap a view pair as only ever receiving guaranteed outputs.
  pub fn new(pair: ViewPair) -> Self {
    Self(pair)
  }

  /// The underlying view pair.
  pub fn view_pair(&self) -> &ViewPair {
    &self.0
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn pair() -> ViewPair {
    let spend = (basepoint() * Scalar::from(7u64)).compress();
    ViewPair::new(spend, Zeroizing::new(Scalar::from(11u64)))
  }

  #[test]
  fn primary_subaddress_is_unmodified() {
    let pair = pair();
    let (spend, _view) = pair.subaddress_keys(SubaddressIndex::PRIMARY);
    assert_eq!(spend, pair.spend_compressed());
    assert_eq!(pair.subaddress_derivation(SubaddressIndex::PRIMARY), Scalar::ZERO);
  }

  #[test]
  fn distinct_subaddresses_derive_distinct_keys() {
    let pair = pair();
    let a = pair.subaddress_keys(SubaddressIndex::new(0, 1));
    let b = pair.subaddress_keys(SubaddressIndex::new(0, 2));
    assert_ne!(a, b);
  }

  #[test]
  fn subaddress_view_key_matches_private_view_scalar() {
    let pair = pair();
    let index = SubaddressIndex::new(0, 5);
    let (spend, view) = pair.subaddress_keys(index);
    let expected_view = spend.decompress().unwrap() * pair.view();
    assert_eq!(view, expected_view.compress());
  }
}
