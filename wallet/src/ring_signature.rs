use std::io::{self, Read, Write};

use zeroize::Zeroize;

use monero_wallet_io::read_raw_vec;
use monero_wallet_primitives::{CompressedPoint, Point, Scalar};

/// A single `(c, s)` ring signature element, pre-RingCT Cryptonote ring signatures.
#[derive(Clone, PartialEq, Eq, Debug, Zeroize)]
struct Signature {
  c: Scalar,
  s: Scalar,
}

impl Signature {
  fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
    self.c.write(w)?;
    self.s.write(w)
  }

  fn read<R: Read>(r: &mut R) -> io::Result<Self> {
    Ok(Self { c: Scalar::read(r)?, s: Scalar::read(r)? })
  }
}

/// A ring signature over a set of decoy outputs, as carried by pre-RingCT ("version 1")
/// transaction inputs. Superseded by CLSAG for RingCT transactions.
#[derive(Clone, PartialEq, Eq, Debug, Zeroize)]
pub struct RingSignature {
  sigs: Vec<Signature>,
}

impl RingSignature {
  /// Write this ring signature.
  pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
    for sig in &self.sigs {
      sig.write(w)?;
    }
    Ok(())
  }

  /// Read a ring signature with exactly `members` entries, one per ring member.
  pub fn read<R: Read>(members: usize, r: &mut R) -> io::Result<Self> {
    Ok(Self { sigs: read_raw_vec(Signature::read, members, r)? })
  }

  /// Verify this ring signature over `msg_hash`, which callers must have derived correctly (the
  /// transaction prefix hash for the input it signs); getting this wrong silently breaks the
  /// signature's binding to the transaction it claims to authorize.
  pub fn verify(&self, msg_hash: &[u8; 32], ring: &[CompressedPoint], key_image: &CompressedPoint) -> bool {
    if ring.len() != self.sigs.len() {
      return false;
    }
    let Some(key_image_point) = key_image.decompress() else { return false };

    let mut buf = Vec::with_capacity(32 + (2 * 32 * ring.len()));
    buf.extend_from_slice(msg_hash);

    let mut sum = Scalar::ZERO;
    for (ring_member, sig) in ring.iter().zip(&self.sigs) {
      let Some(member_point) = ring_member.decompress() else { return false };

      let l = (basepoint() * sig.s) + (member_point * sig.c);
      buf.extend_from_slice(l.compress().to_bytes().as_slice());

      let r = (Point::hash_to_point(ring_member.to_bytes()) * sig.s) + (key_image_point * sig.c);
      buf.extend_from_slice(r.compress().to_bytes().as_slice());

      sum = sum + sig.c;
    }
    sum == Scalar::hash(buf)
  }
}

fn basepoint() -> Point {
  CompressedPoint::G.decompress().expect("G must decompress")
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn rejects_ring_length_mismatch() {
    let sig = RingSignature { sigs: vec![] };
    let ring = [CompressedPoint::G];
    assert!(!sig.verify(&[0; 32], &ring, &CompressedPoint::IDENTITY));
  }

  #[test]
  fn write_read_round_trips() {
    let sig = RingSignature {
      sigs: vec![Signature { c: Scalar::from(1u64), s: Scalar::from(2u64) }],
    };
    let mut buf = Vec::new();
    sig.write(&mut buf).unwrap();
    let read = RingSignature::read(1, &mut buf.as_slice()).unwrap();
    assert_eq!(read, sig);
  }
}
