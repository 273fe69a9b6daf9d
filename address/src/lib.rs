#![doc = "Monero's block-encoded Base58 and wallet address serialization (network/type prefix, spend/view keys, optional payment ID, checksum)."]
#![deny(missing_docs)]

pub mod base58;

use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use monero_wallet_primitives::{keccak256, CompressedPoint};

const CHECKSUM_LEN: usize = 4;
const PAYMENT_ID_LEN: usize = 8;

/// Which Monero network an address belongs to.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Network {
  /// The production Monero network.
  Mainnet,
  /// The public test network mirroring mainnet's consensus rules.
  Stagenet,
  /// The network used for pre-release consensus testing.
  Testnet,
}

/// The shape of an address: standard, subaddress, or integrated (standard + payment ID).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AddressType {
  /// A primary or account/subaddress-index address.
  Standard,
  /// A subaddress, derived per the keychain's subaddress scheme.
  Subaddress,
  /// A standard address bound to an 8-byte payment ID.
  Integrated([u8; PAYMENT_ID_LEN]),
}

/// An error decoding a Monero address.
#[derive(Clone, Copy, PartialEq, Eq, Debug, thiserror::Error)]
pub enum AddressError {
  /// The Base58 payload was malformed.
  #[error("invalid base58: {0}")]
  Base58(#[from] base58::Error),
  /// The decoded payload had the wrong length for any known address type.
  #[error("invalid address length")]
  InvalidLength,
  /// The prefix byte did not match any known network/type combination.
  #[error("unrecognized network/type prefix byte")]
  UnknownPrefix,
  /// The trailing checksum did not match.
  #[error("checksum mismatch")]
  ChecksumMismatch,
}

fn prefix_byte(network: Network, kind: &AddressType) -> u8 {
  match (network, kind) {
    (Network::Mainnet, AddressType::Standard) => 18,
    (Network::Mainnet, AddressType::Subaddress) => 42,
    (Network::Mainnet, AddressType::Integrated(_)) => 19,
    (Network::Stagenet, AddressType::Standard) => 24,
    (Network::Stagenet, AddressType::Subaddress) => 36,
    (Network::Stagenet, AddressType::Integrated(_)) => 25,
    (Network::Testnet, AddressType::Standard) => 53,
    (Network::Testnet, AddressType::Subaddress) => 63,
    (Network::Testnet, AddressType::Integrated(_)) => 54,
  }
}

fn network_and_kind_for_prefix(byte: u8) -> Option<(Network, bool, bool)> {
  // (network, is_subaddress, is_integrated)
  Some(match byte {
    18 => (Network::Mainnet, false, false),
    42 => (Network::Mainnet, true, false),
    19 => (Network::Mainnet, false, true),
    24 => (Network::Stagenet, false, false),
    36 => (Network::Stagenet, true, false),
    25 => (Network::Stagenet, false, true),
    53 => (Network::Testnet, false, false),
    63 => (Network::Testnet, true, false),
    54 => (Network::Testnet, false, true),
    _ => return None,
  })
}

/// A Monero wallet address: a network/type tag, spend and view public keys, and (for integrated
/// addresses) a payment ID, all bound together by a 4-byte checksum.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Address {
  network: Network,
  kind: AddressType,
  spend: CompressedPoint,
  view: CompressedPoint,
}

impl Address {
  /// Build a standard address from its network and public keys.
  pub fn standard(network: Network, spend: CompressedPoint, view: CompressedPoint) -> Self {
    Self { network, kind: AddressType::Standard, spend, view }
  }

  /// Build a subaddress from its network and derived public keys.
  pub fn subaddress(network: Network, spend: CompressedPoint, view: CompressedPoint) -> Self {
    Self { network, kind: AddressType::Subaddress, spend, view }
  }

  /// Build an integrated address binding a standard address to a payment ID.
  pub fn integrated(
    network: Network,
    spend: CompressedPoint,
    view: CompressedPoint,
    payment_id: [u8; PAYMENT_ID_LEN],
  ) -> Self {
    Self { network, kind: AddressType::Integrated(payment_id), spend, view }
  }

  /// This address's network.
  pub fn network(&self) -> Network {
    self.network
  }

  /// This address's type, including its payment ID if integrated.
  pub fn kind(&self) -> AddressType {
    self.kind
  }

  /// The public spend key.
  pub fn spend(&self) -> CompressedPoint {
    self.spend
  }

  /// The public view key.
  pub fn view(&self) -> CompressedPoint {
    self.view
  }

  /// Encode this address as Monero-flavored Base58.
  pub fn encode(&self) -> String {
    let mut payload = Vec::with_capacity(1 + 32 + 32 + PAYMENT_ID_LEN + CHECKSUM_LEN);
    payload.push(prefix_byte(self.network, &self.kind));
    payload.extend_from_slice(&self.spend.to_bytes());
    payload.extend_from_slice(&self.view.to_bytes());
    if let AddressType::Integrated(payment_id) = self.kind {
      payload.extend_from_slice(&payment_id);
    }

    let mut checksum = keccak256(&payload);
    checksum[CHECKSUM_LEN ..].zeroize();
    payload.extend_from_slice(&checksum[.. CHECKSUM_LEN]);

    base58::encode(&payload)
  }

  /// Decode a Monero address from its Base58 string form.
  pub fn decode(s: &str) -> Result<Self, AddressError> {
    let bytes = base58::decode(s)?;
    if bytes.len() < 1 + 32 + 32 + CHECKSUM_LEN {
      return Err(AddressError::InvalidLength);
    }

    let (body, checksum) = bytes.split_at(bytes.len() - CHECKSUM_LEN);
    let expected = keccak256(body);
    if !bool::from(expected[.. CHECKSUM_LEN].ct_eq(checksum)) {
      return Err(AddressError::ChecksumMismatch);
    }

    let (network, is_subaddress, is_integrated) =
      network_and_kind_for_prefix(body[0]).ok_or(AddressError::UnknownPrefix)?;

    let expected_body_len = 1 + 32 + 32 + if is_integrated { PAYMENT_ID_LEN } else { 0 };
    if body.len() != expected_body_len {
      return Err(AddressError::InvalidLength);
    }

    let spend = CompressedPoint::from_bytes(body[1 .. 33].try_into().unwrap());
    let view = CompressedPoint::from_bytes(body[33 .. 65].try_into().unwrap());

    let kind = if is_integrated {
      AddressType::Integrated(body[65 .. 65 + PAYMENT_ID_LEN].try_into().unwrap())
    } else if is_subaddress {
      AddressType::Subaddress
    } else {
      AddressType::Standard
    };

    Ok(Self { network, kind, spend, view })
  }
}

/// A subaddress index: a major (account) and minor (address-within-account) pair.
///
/// `(0, 0)` is reserved for the primary address and must bypass subaddress derivation entirely.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct SubaddressIndex {
  major: u32,
  minor: u32,
}

impl SubaddressIndex {
  /// The primary address's index, `(0, 0)`.
  pub const PRIMARY: Self = Self { major: 0, minor: 0 };

  /// Build a subaddress index.
  pub fn new(major: u32, minor: u32) -> Self {
    Self { major, minor }
  }

  /// Whether this is the primary index, `(0, 0)`.
  pub fn is_primary(&self) -> bool {
    *self == Self::PRIMARY
  }

  /// The major (account) index.
  pub fn major(&self) -> u32 {
    self.major
  }

  /// The minor (address) index.
  pub fn minor(&self) -> u32 {
    self.minor
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn standard_address_round_trips() {
    let spend = CompressedPoint::G;
    let view = CompressedPoint::H;
    let addr = Address::standard(Network::Mainnet, spend, view);
    let encoded = addr.encode();
    let decoded = Address::decode(&encoded).unwrap();
    assert_eq!(decoded, addr);
    assert_eq!(decoded.kind(), AddressType::Standard);
  }

  #[test]
  fn integrated_address_carries_payment_id() {
    let payment_id = [1, 2, 3, 4, 5, 6, 7, 8];
    let addr = Address::integrated(Network::Mainnet, CompressedPoint::G, CompressedPoint::H, payment_id);
    let decoded = Address::decode(&addr.encode()).unwrap();
    assert_eq!(decoded.kind(), AddressType::Integrated(payment_id));
  }

  #[test]
  fn corrupted_checksum_is_rejected() {
    let addr = Address::standard(Network::Mainnet, CompressedPoint::G, CompressedPoint::H);
    let mut encoded = addr.encode();
    // Flip the final character, which only ever touches checksum bytes.
    let last = encoded.pop().unwrap();
    encoded.push(if last == '1' { '2' } else { '1' });
    assert!(matches!(Address::decode(&encoded), Err(AddressError::ChecksumMismatch) | Err(AddressError::Base58(_))));
  }

  #[test]
  fn primary_subaddress_index_is_flagged() {
    assert!(SubaddressIndex::PRIMARY.is_primary());
    assert!(!SubaddressIndex::new(1, 5).is_primary());
  }
}
