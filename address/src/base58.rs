//! Monero's block-encoded Base58, distinct from Bitcoin's whole-buffer Base58.
//!
//! Data is split into 8-byte blocks; each full block encodes to 11 characters, and a
//! trailing partial block encodes to a size looked up in `ENCODED_BLOCK_SIZES`.

const ALPHABET: &[u8; 58] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";
const FULL_BLOCK_SIZE: usize = 8;
const FULL_ENCODED_BLOCK_SIZE: usize = 11;
// Encoded length for a raw block of `i` bytes, i.e. ENCODED_BLOCK_SIZES[i].
const ENCODED_BLOCK_SIZES: [usize; 9] = [0, 2, 3, 5, 6, 7, 9, 10, 11];

/// A Base58 decode error.
#[derive(Clone, Copy, PartialEq, Eq, Debug, thiserror::Error)]
pub enum Error {
  /// A character outside the 58-character alphabet was encountered.
  #[error("character not in the Base58 alphabet")]
  InvalidCharacter,
  /// The length of a trailing (partial) block wasn't one of the valid encoded sizes.
  #[error("invalid trailing block length")]
  InvalidBlockLength,
  /// A block decoded to a value too large to fit in its expected byte width.
  #[error("block decoded to an out-of-range value")]
  BlockOverflow,
}

fn decoded_block_size(encoded_len: usize) -> Option<usize> {
  ENCODED_BLOCK_SIZES.iter().position(|&size| size == encoded_len)
}

fn digit(c: u8) -> Result<u64, Error> {
  ALPHABET.iter().position(|&a| a == c).map(|i| i as u64).ok_or(Error::InvalidCharacter)
}

fn encode_block(block: &[u8], out: &mut [u8]) {
  debug_assert!(block.len() <= FULL_BLOCK_SIZE);
  let mut num: u64 = 0;
  for &b in block {
    num = (num << 8) | u64::from(b);
  }
  for slot in out.iter_mut().rev() {
    *slot = ALPHABET[(num % 58) as usize];
    num /= 58;
  }
}

fn decode_block(block: &[u8], out: &mut [u8]) -> Result<(), Error> {
  // u128 headroom: the densest block (11 chars) can exceed u64::MAX mid-accumulation.
  let mut num: u128 = 0;
  for &c in block {
    num = num * 58 + u128::from(digit(c)?);
  }
  let width = out.len();
  if width < 16 && (num >> (8 * width)) != 0 {
    return Err(Error::BlockOverflow);
  }
  let bytes = num.to_be_bytes();
  out.copy_from_slice(&bytes[16 - width ..]);
  Ok(())
}

/// Encode bytes as Monero-flavored block Base58.
pub fn encode(data: &[u8]) -> String {
  let full_chunks = data.len() / FULL_BLOCK_SIZE;
  let (full, remainder) = data.split_at(full_chunks * FULL_BLOCK_SIZE);

  let mut out = Vec::with_capacity(full_chunks * FULL_ENCODED_BLOCK_SIZE + FULL_ENCODED_BLOCK_SIZE);
  for chunk in full.chunks(FULL_BLOCK_SIZE) {
    let mut buf = [0u8; FULL_ENCODED_BLOCK_SIZE];
    encode_block(chunk, &mut buf);
    out.extend_from_slice(&buf);
  }
  if !remainder.is_empty() {
    let mut buf = vec![0u8; ENCODED_BLOCK_SIZES[remainder.len()]];
    encode_block(remainder, &mut buf);
    out.extend_from_slice(&buf);
  }
  String::from_utf8(out).expect("the Base58 alphabet is plain ASCII")
}

/// Decode Monero-flavored block Base58.
pub fn decode(s: &str) -> Result<Vec<u8>, Error> {
  let data = s.as_bytes();
  let full_chunks = data.len() / FULL_ENCODED_BLOCK_SIZE;
  let (full, remainder) = data.split_at(full_chunks * FULL_ENCODED_BLOCK_SIZE);

  let mut out = Vec::with_capacity(full_chunks * FULL_BLOCK_SIZE + FULL_BLOCK_SIZE);
  for chunk in full.chunks(FULL_ENCODED_BLOCK_SIZE) {
    let mut buf = [0u8; FULL_BLOCK_SIZE];
    decode_block(chunk, &mut buf)?;
    out.extend_from_slice(&buf);
  }
  if !remainder.is_empty() {
    let decoded_len = decoded_block_size(remainder.len()).ok_or(Error::InvalidBlockLength)?;
    let mut buf = vec![0u8; decoded_len];
    decode_block(remainder, &mut buf)?;
    out.extend_from_slice(&buf);
  }
  Ok(out)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn round_trips_arbitrary_lengths() {
    for len in 0 .. 40 {
      let data: Vec<u8> = (0 .. len as u8).collect();
      assert_eq!(decode(&encode(&data)).unwrap(), data);
    }
  }

  #[test]
  fn rejects_invalid_trailing_block_length() {
    // 4 is not in the valid trailing-block length set {2,3,5,6,7,9,10,11}.
    assert_eq!(decode("1111").unwrap_err(), Error::InvalidBlockLength);
  }

  #[test]
  fn rejects_non_alphabet_characters() {
    assert_eq!(decode("0").unwrap_err(), Error::InvalidCharacter);
  }
}
