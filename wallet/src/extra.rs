use std::io::{self, Read, Write};
use std::ops::BitXor;

use monero_wallet_io::{read_byte, read_vec, write_byte, write_vec, VarInt};
use monero_wallet_primitives::{CompressedPoint, Point};

/// The highest byte a VarInt length prefix can represent in a single byte. Used as a marker
/// prefixing application-defined bytes stashed inside a `Nonce` extra field; not part of
/// standard Monero, a convention of this library alone for round-tripping caller metadata.
pub const ARBITRARY_DATA_MARKER: u8 = 127;
/// The largest single chunk of arbitrary data a `Nonce` field can carry (the field's one-byte
/// marker leaves 254 bytes for a `u8`-length-prefixed payload within the 255-byte `Nonce` bound).
pub const MAX_ARBITRARY_DATA_SIZE: usize = 254;
/// The largest `extra` a relaying node will forward without considering it spam, per Monero's
/// `tx_extra_max_size` default.
pub const MAX_EXTRA_SIZE_BY_RELAY_RULE: usize = 1060;

const PADDING_MARKER: u8 = 0;
const PUBLIC_KEY_MARKER: u8 = 1;
const NONCE_MARKER: u8 = 2;
const MERGE_MINING_MARKER: u8 = 3;
const PUBLIC_KEYS_MARKER: u8 = 4;
const MYSTERIOUS_MINERGATE_MARKER: u8 = 0xde;

const MAX_PADDING: usize = 255;

/// A transaction's payment ID, carried inside a `Nonce` extra field.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PaymentId {
  /// A 32-byte payment ID, carried in the clear. Deprecated by the protocol: it fingerprints a
  /// transaction to a single recipient more strongly than an encrypted one does, and hardforks
  /// from v12 onward drop it from scan results entirely.
  Unencrypted([u8; 32]),
  /// An 8-byte payment ID, XORed against a per-output ECDH-derived mask so only the recipient can
  /// recover it.
  Encrypted([u8; 8]),
}

impl BitXor<[u8; 8]> for PaymentId {
  type Output = PaymentId;
  fn bitxor(self, mask: [u8; 8]) -> PaymentId {
    match self {
      PaymentId::Encrypted(id) => {
        let mut res = [0; 8];
        for i in 0 .. 8 {
          res[i] = id[i] ^ mask[i];
        }
        PaymentId::Encrypted(res)
      }
      PaymentId::Unencrypted(_) => self,
    }
  }
}

impl PaymentId {
  /// Write this payment ID, prefixed by its marker byte.
  pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
    match self {
      PaymentId::Unencrypted(id) => {
        write_byte(&0, w)?;
        w.write_all(id)
      }
      PaymentId::Encrypted(id) => {
        write_byte(&1, w)?;
        w.write_all(id)
      }
    }
  }

  /// Read a payment ID, consuming it exactly.
  pub fn read<R: Read>(r: &mut R) -> io::Result<Self> {
    match read_byte(r)? {
      0 => {
        let mut id = [0; 32];
        r.read_exact(&mut id)?;
        Ok(PaymentId::Unencrypted(id))
      }
      1 => {
        let mut id = [0; 8];
        r.read_exact(&mut id)?;
        Ok(PaymentId::Encrypted(id))
      }
      _ => Err(io::Error::other("unrecognized payment ID marker")),
    }
  }
}

/// A single TLV-encoded entry in a transaction's `extra` field.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum ExtraField {
  /// Zero padding, reserved for block template alignment. Decoded as a run-length, not the bytes
  /// themselves (which must be exactly `0x00`).
  Padding(usize),
  /// The transaction's (or an additional) one-time public key.
  PublicKey(CompressedPoint),
  /// An opaque, length-prefixed byte string: in practice, almost always an encoded [`PaymentId`]
  /// or this library's arbitrary-data convention.
  Nonce(Vec<u8>),
  /// A merge-mining commitment: the aux chain count and merkle root.
  MergeMining(u64, [u8; 32]),
  /// Additional one-time public keys, one per payment beyond the first, for transactions using
  /// subaddress destinations.
  PublicKeys(Vec<CompressedPoint>),
  /// An undocumented field observed from the MinerGate pool; preserved verbatim so this library
  /// doesn't corrupt `extra` fields it round-trips.
  MysteriousMinergate(Vec<u8>),
}

impl ExtraField {
  fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
    match self {
      ExtraField::Padding(len) => {
        for _ in 0 .. *len {
          write_byte(&PADDING_MARKER, w)?;
        }
      }
      ExtraField::PublicKey(key) => {
        write_byte(&PUBLIC_KEY_MARKER, w)?;
        key.write(w)?;
      }
      ExtraField::Nonce(data) => {
        write_byte(&NONCE_MARKER, w)?;
        write_vec(write_byte, data, w)?;
      }
      ExtraField::MergeMining(depth, merkle_root) => {
        write_byte(&MERGE_MINING_MARKER, w)?;
        VarInt::write(depth, w)?;
        w.write_all(merkle_root)?;
      }
      ExtraField::PublicKeys(keys) => {
        write_byte(&PUBLIC_KEYS_MARKER, w)?;
        write_vec(|key: &CompressedPoint, w| key.write(w), keys, w)?;
      }
      ExtraField::MysteriousMinergate(data) => {
        write_byte(&MYSTERIOUS_MINERGATE_MARKER, w)?;
        write_vec(write_byte, data, w)?;
      }
    }
    Ok(())
  }

  fn read<R: Read>(r: &mut R) -> io::Result<Self> {
    match read_byte(r)? {
      PADDING_MARKER => {
        let mut len = 1;
        // Consume further zero bytes greedily, up to the field's maximum length, stopping
        // cleanly at EOF or the first non-zero byte (which begins the next field).
        loop {
          if len >= MAX_PADDING {
            break;
          }
          let mut probe = [0u8; 1];
          match r.read(&mut probe)? {
            0 => break,
            _ if probe[0] == 0 => len += 1,
            _ => return Err(io::Error::other("padding field ended on a non-zero byte")),
          }
        }
        Ok(ExtraField::Padding(len))
      }
      PUBLIC_KEY_MARKER => Ok(ExtraField::PublicKey(CompressedPoint::read(r)?)),
      NONCE_MARKER => Ok(ExtraField::Nonce(read_vec(read_byte, Some(255), r)?)),
      MERGE_MINING_MARKER => {
        let depth: u64 = VarInt::read(r)?;
        let mut merkle_root = [0; 32];
        r.read_exact(&mut merkle_root)?;
        Ok(ExtraField::MergeMining(depth, merkle_root))
      }
      PUBLIC_KEYS_MARKER => {
        Ok(ExtraField::PublicKeys(read_vec(CompressedPoint::read, None, r)?))
      }
      MYSTERIOUS_MINERGATE_MARKER => {
        Ok(ExtraField::MysteriousMinergate(read_vec(read_byte, None, r)?))
      }
      _ => Err(io::Error::other("unrecognized extra field marker")),
    }
  }
}

/// A transaction's `extra` field: an ordered list of TLV entries carrying its one-time key(s),
/// payment ID, and any caller-defined arbitrary data.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct Extra(Vec<ExtraField>);

impl Extra {
  /// Build an `extra` carrying a transaction key and any additional keys.
  pub fn new(key: CompressedPoint, additional_keys: Vec<CompressedPoint>) -> Self {
    let mut fields = vec![ExtraField::PublicKey(key)];
    if !additional_keys.is_empty() {
      fields.push(ExtraField::PublicKeys(additional_keys));
    }
    Self(fields)
  }

  /// Append a `Nonce` field.
  pub fn push_nonce(&mut self, nonce: Vec<u8>) {
    self.0.push(ExtraField::Nonce(nonce));
  }

  /// The transaction's primary key, and any additional per-payment keys, decompressed.
  ///
  /// A key failing to decompress is mapped to the identity point rather than rejected outright,
  /// matching how scanning must tolerate malformed keys in transactions it doesn't control.
  /// Returns `None` only if no `PublicKey` field was present at all.
  pub fn keys(&self) -> Option<(Vec<Point>, Option<Vec<Point>>)> {
    let decompress_or_identity = |k: &CompressedPoint| k.decompress().unwrap_or(Point::hash_to_point([0; 32]));
    let key = self.0.iter().find_map(|field| match field {
      ExtraField::PublicKey(key) => Some(decompress_or_identity(key)),
      _ => None,
    })?;
    let additional = self.0.iter().find_map(|field| match field {
      ExtraField::PublicKeys(keys) => Some(keys.iter().map(decompress_or_identity).collect()),
      _ => None,
    });
    Some((vec![key], additional))
  }

  /// The payment ID, if this `extra` carries a `Nonce` field parsing as one.
  pub fn payment_id(&self) -> Option<PaymentId> {
    self.0.iter().find_map(|field| match field {
      ExtraField::Nonce(data) => {
        let mut data = data.as_slice();
        let id = PaymentId::read(&mut data).ok()?;
        data.is_empty().then_some(id)
      }
      _ => None,
    })
  }

  /// Any arbitrary-data chunks this library's sender stashed in `Nonce` fields, identified by
  /// their [`ARBITRARY_DATA_MARKER`] prefix byte.
  pub fn arbitrary_data(&self) -> Vec<Vec<u8>> {
    let mut res = vec![];
    for field in &self.0 {
      if let ExtraField::Nonce(data) = field {
        if data.first() == Some(&ARBITRARY_DATA_MARKER) {
          res.push(data[1 ..].to_vec());
        }
      }
    }
    res
  }

  /// Write this `extra`, with no overall length prefix (the field list itself is self-delimiting,
  /// matching Monero's raw `extra: Vec<u8>` representation on the wire).
  pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
    for field in &self.0 {
      field.write(w)?;
    }
    Ok(())
  }

  /// Serialize this `extra` to a byte vector.
  pub fn serialize(&self) -> Vec<u8> {
    let mut res = Vec::new();
    self.write(&mut res).expect("write failed but Vec<u8> is infallible");
    res
  }

  /// Read an `extra` field list until EOF, bounded by `MAX_EXTRA_SIZE_BY_RELAY_RULE` fields to
  /// avoid spinning on a malformed or adversarial buffer.
  pub fn read<R: Read>(r: &mut R) -> io::Result<Self> {
    let mut buf = Vec::new();
    r.read_to_end(&mut buf)?;

    let mut cursor = buf.as_slice();
    let mut fields = vec![];
    while !cursor.is_empty() {
      fields.push(ExtraField::read(&mut cursor)?);
      if fields.len() > MAX_EXTRA_SIZE_BY_RELAY_RULE {
        return Err(io::Error::other("extra field exceeded the relay size bound"));
      }
    }
    Ok(Self(fields))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn round_trips_key_and_payment_id() {
    let mut extra = Extra::new(CompressedPoint::G, vec![]);
    let mut id_vec = Vec::new();
    PaymentId::Encrypted([1, 2, 3, 4, 5, 6, 7, 8]).write(&mut id_vec).unwrap();
    extra.push_nonce(id_vec);

    let serialized = extra.serialize();
    let read = Extra::read(&mut serialized.as_slice()).unwrap();
    assert_eq!(read, extra);
    assert_eq!(read.payment_id(), Some(PaymentId::Encrypted([1, 2, 3, 4, 5, 6, 7, 8])));
  }

  #[test]
  fn arbitrary_data_round_trips() {
    let mut extra = Extra::new(CompressedPoint::G, vec![]);
    let mut chunk = vec![ARBITRARY_DATA_MARKER];
    chunk.extend(b"hello");
    extra.push_nonce(chunk);
    assert_eq!(extra.arbitrary_data(), vec![b"hello".to_vec()]);
  }

  #[test]
  fn encrypted_payment_id_xor_only_applies_to_encrypted() {
    let id = PaymentId::Encrypted([0xff; 8]) ^ [0x0f; 8];
    assert_eq!(id, PaymentId::Encrypted([0xf0; 8]));

    let unenc = PaymentId::Unencrypted([0xff; 32]) ^ [0x0f; 8];
    assert_eq!(unenc, PaymentId::Unencrypted([0xff; 32]));
  }
}
