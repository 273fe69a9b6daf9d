use std::io::{self, Read, Write};

use subtle::{Choice, ConstantTimeEq};

use monero_wallet_address::SubaddressIndex;
use monero_wallet_io::{read_byte, read_bytes, read_u64, read_vec, write_byte, write_vec, VarInt};
use monero_wallet_primitives::{CompressedPoint, Commitment, Point, Scalar};

use crate::extra::PaymentId;
use crate::transaction::Timelock;

/// A single output's position within the transaction that created it.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct AbsoluteId {
  /// The hash of the transaction which created this output.
  pub transaction: [u8; 32],
  /// This output's index among that transaction's outputs.
  pub index_in_transaction: u64,
}

/// A single output's position within the blockchain's global RingCT output index, used as the
/// handle decoy selection and `get_outs` calls reference it by.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct RelativeId {
  /// The output's global index on the blockchain.
  pub index_on_blockchain: u64,
}

/// The cryptographic material identifying and spending an output: its one-time public key, the
/// scalar offset from the wallet's base spend key needed to produce its private key, and its
/// Pedersen commitment opening.
#[derive(Clone, Copy, Debug)]
pub struct OutputData {
  /// The output's one-time public key.
  pub key: CompressedPoint,
  /// The scalar such that `spend_key + key_offset` is this output's private key.
  pub key_offset: Scalar,
  /// The output's Pedersen commitment opening (mask and amount).
  pub commitment: Commitment,
}

impl ConstantTimeEq for OutputData {
  fn ct_eq(&self, other: &Self) -> Choice {
    self.key.ct_eq(&other.key) &
      self.key_offset.ct_eq(&other.key_offset) &
      Choice::from(u8::from(self.commitment == other.commitment))
  }
}
impl PartialEq for OutputData {
  fn eq(&self, other: &Self) -> bool {
    bool::from(self.ct_eq(other))
  }
}
impl Eq for OutputData {}

impl OutputData {
  fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
    self.key.write(w)?;
    self.key_offset.write(w)?;
    self.commitment.write(w)
  }

  fn read<R: Read>(r: &mut R) -> io::Result<Self> {
    Ok(Self {
      key: CompressedPoint::read(r)?,
      key_offset: Scalar::read(r)?,
      commitment: Commitment::read(r)?,
    })
  }
}

/// The bound a scanner places on caller-supplied arbitrary data chunks, matching
/// [`crate::extra::MAX_ARBITRARY_DATA_SIZE`].
pub const MAX_ARBITRARY_DATA_SIZE: usize = crate::extra::MAX_ARBITRARY_DATA_SIZE;

/// Metadata about an output beyond what's needed to spend it: its timelock, which subaddress (if
/// any) received it, its payment ID, and any arbitrary data riding alongside it in `extra`.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct Metadata {
  /// The output's timelock, beyond the transaction's own default unlock time.
  pub additional_timelock: Timelock,
  /// The subaddress this output was received at, `None` for the primary address.
  pub subaddress: Option<SubaddressIndex>,
  /// The payment ID this output's transaction carried, if any.
  pub payment_id: Option<PaymentId>,
  /// Arbitrary caller-defined data chunks recovered from the transaction's `extra`.
  pub arbitrary_data: Vec<Vec<u8>>,
}

impl Metadata {
  fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
    self.additional_timelock.write(w)?;

    write_byte(&u8::from(self.subaddress.is_some()), w)?;
    if let Some(subaddress) = self.subaddress {
      w.write_all(&subaddress.major().to_le_bytes())?;
      w.write_all(&subaddress.minor().to_le_bytes())?;
    }

    write_byte(&u8::from(self.payment_id.is_some()), w)?;
    if let Some(payment_id) = &self.payment_id {
      payment_id.write(w)?;
    }

    write_vec(
      |chunk: &Vec<u8>, w: &mut W| {
        let len = u8::try_from(chunk.len())
          .map_err(|_| io::Error::other("arbitrary data chunk exceeds 255 bytes"))?;
        write_byte(&len, w)?;
        w.write_all(chunk)
      },
      &self.arbitrary_data,
      w,
    )
  }

  fn read<R: Read>(r: &mut R) -> io::Result<Self> {
    let additional_timelock = Timelock::read(r)?;

    let subaddress = match read_byte(r)? {
      0 => None,
      1 => {
        let major = u32::from_le_bytes(read_bytes(r)?);
        let minor = u32::from_le_bytes(read_bytes(r)?);
        Some(SubaddressIndex::new(major, minor))
      }
      _ => return Err(io::Error::other("invalid subaddress presence flag")),
    };

    let payment_id = match read_byte(r)? {
      0 => None,
      1 => Some(PaymentId::read(r)?),
      _ => return Err(io::Error::other("invalid payment ID presence flag")),
    };

    let arbitrary_data = read_vec(
      |r| {
        let len = read_byte(r)?;
        let mut chunk = vec![0; usize::from(len)];
        r.read_exact(&mut chunk)?;
        Ok(chunk)
      },
      None,
      r,
    )?;

    Ok(Self { additional_timelock, subaddress, payment_id, arbitrary_data })
  }
}

/// An output belonging to a wallet, as recovered by [`crate::scan::Scanner`].
#[derive(Clone, Debug)]
pub struct WalletOutput {
  absolute_id: AbsoluteId,
  relative_id: Option<RelativeId>,
  data: OutputData,
  metadata: Metadata,
}

impl ConstantTimeEq for WalletOutput {
  fn ct_eq(&self, other: &Self) -> Choice {
    self.absolute_id.transaction.ct_eq(&other.absolute_id.transaction) &
      self.absolute_id.index_in_transaction.ct_eq(&other.absolute_id.index_in_transaction) &
      self.data.ct_eq(&other.data)
  }
}
impl PartialEq for WalletOutput {
  fn eq(&self, other: &Self) -> bool {
    bool::from(self.ct_eq(other)) && (self.metadata == other.metadata)
  }
}
impl Eq for WalletOutput {}

impl WalletOutput {
  /// Construct a wallet output. Used by [`crate::scan::Scanner`] once it's recovered an output's
  /// key offset, commitment, and metadata.
  pub fn new(
    absolute_id: AbsoluteId,
    relative_id: Option<RelativeId>,
    data: OutputData,
    metadata: Metadata,
  ) -> Self {
    Self { absolute_id, relative_id, data, metadata }
  }

  /// The hash of the transaction which created this output.
  pub fn transaction(&self) -> [u8; 32] {
    self.absolute_id.transaction
  }
  /// This output's index within its transaction.
  pub fn index_in_transaction(&self) -> u64 {
    self.absolute_id.index_in_transaction
  }
  /// This output's index on the blockchain's global RingCT output index, if known.
  pub fn index_on_blockchain(&self) -> Option<u64> {
    self.relative_id.map(|id| id.index_on_blockchain)
  }
  /// The output's one-time public key.
  pub fn key(&self) -> CompressedPoint {
    self.data.key
  }
  /// The scalar offset from the wallet's spend key needed to produce this output's private key.
  pub fn key_offset(&self) -> Scalar {
    self.data.key_offset
  }
  /// The output's Pedersen commitment opening.
  pub fn commitment(&self) -> Commitment {
    self.data.commitment
  }
  /// The output's additional timelock.
  pub fn additional_timelock(&self) -> Timelock {
    self.metadata.additional_timelock
  }
  /// The subaddress this output was received at.
  pub fn subaddress(&self) -> Option<SubaddressIndex> {
    self.metadata.subaddress
  }
  /// The payment ID this output's transaction carried.
  pub fn payment_id(&self) -> Option<PaymentId> {
    self.metadata.payment_id
  }
  /// Arbitrary data chunks recovered alongside this output.
  pub fn arbitrary_data(&self) -> &[Vec<u8>] {
    &self.metadata.arbitrary_data
  }

  /// Clear a recovered payment ID, e.g. because it was unencrypted and the active hardfork no
  /// longer permits trusting one.
  pub(crate) fn clear_payment_id(&mut self) {
    self.metadata.payment_id = None;
  }

  /// This output's key image `x * Hp(P)`, where `x = spend_scalar + key_offset` is its full
  /// private spend scalar and `Hp(P)` hashes its one-time public key to a curve point.
  ///
  /// Requires the wallet's full private spend scalar; a view-only wallet has no way to compute
  /// this and must fall back to a placeholder (or an imported key image) until one is supplied.
  pub fn key_image(&self, spend_scalar: Scalar) -> Option<Point> {
    self.data.key.decompress()?;
    let x = spend_scalar + self.data.key_offset;
    let hashed = Point::hash_to_point(self.data.key.to_bytes());
    Some(Point::key_image(x, hashed))
  }

  /// Write this output, for wallet-local persistence. This is not a Monero protocol format.
  pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
    w.write_all(&self.absolute_id.transaction)?;
    w.write_all(&self.absolute_id.index_in_transaction.to_le_bytes())?;
    write_byte(&u8::from(self.relative_id.is_some()), w)?;
    if let Some(relative_id) = self.relative_id {
      w.write_all(&relative_id.index_on_blockchain.to_le_bytes())?;
    }
    self.data.write(w)?;
    self.metadata.write(w)
  }

  /// Serialize this output to a byte vector.
  pub fn serialize(&self) -> Vec<u8> {
    let mut res = Vec::new();
    self.write(&mut res).expect("write failed but Vec<u8> is infallible");
    res
  }

  /// Read an output written by [`Self::write`].
  pub fn read<R: Read>(r: &mut R) -> io::Result<Self> {
    let absolute_id =
      AbsoluteId { transaction: read_bytes(r)?, index_in_transaction: read_u64(r)? };
    let relative_id = match read_byte(r)? {
      0 => None,
      1 => Some(RelativeId { index_on_blockchain: read_u64(r)? }),
      _ => return Err(io::Error::other("invalid relative ID presence flag")),
    };
    let data = OutputData::read(r)?;
    let metadata = Metadata::read(r)?;
    Ok(Self::new(absolute_id, relative_id, data, metadata))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn sample() -> WalletOutput {
    WalletOutput::new(
      AbsoluteId { transaction: [7; 32], index_in_transaction: 1 },
      Some(RelativeId { index_on_blockchain: 9000 }),
      OutputData {
        key: CompressedPoint::G,
        key_offset: Scalar::from(3u64),
        commitment: Commitment::new(Scalar::from(5u64), 1_000_000),
      },
      Metadata {
        additional_timelock: Timelock::None,
        subaddress: Some(SubaddressIndex::new(0, 2)),
        payment_id: Some(PaymentId::Encrypted([1; 8])),
        arbitrary_data: vec![b"note".to_vec()],
      },
    )
  }

  #[test]
  fn round_trips_through_serialization() {
    let output = sample();
    let serialized = output.serialize();
    let read = WalletOutput::read(&mut serialized.as_slice()).unwrap();
    assert_eq!(read, output);
  }

  #[test]
  fn clearing_payment_id_drops_it() {
    let mut output = sample();
    output.clear_payment_id();
    assert_eq!(output.payment_id(), None);
  }
}
