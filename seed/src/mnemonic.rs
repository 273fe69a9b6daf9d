use crate::wordlist::{self, PREFIX_LEN, WORD_COUNT};

const ENTROPY_WORDS: usize = 24;
const TOTAL_WORDS: usize = 25;

/// An error decoding a 25-word mnemonic.
#[derive(Clone, Copy, PartialEq, Eq, Debug, thiserror::Error)]
pub enum MnemonicError {
  /// The mnemonic did not contain exactly 25 words.
  #[error("expected 25 words, got {0}")]
  WrongWordCount(usize),
  /// A word was not found in the word list.
  #[error("word {0:?} is not in the word list")]
  UnknownWord(String),
  /// The 25th (checksum) word did not match the CRC32 of the first 24.
  #[error("checksum word mismatch")]
  ChecksumMismatch,
}

fn pack_chunk(x: u32) -> [usize; 3] {
  let n = WORD_COUNT as u64;
  let x = u64::from(x);
  let w1 = x % n;
  let w2 = ((x / n) + w1) % n;
  let w3 = ((x / n / n) + w2) % n;
  [w1 as usize, w2 as usize, w3 as usize]
}

fn unpack_chunk(w1: usize, w2: usize, w3: usize) -> u32 {
  let n = WORD_COUNT as i64;
  let q1 = (w2 as i64 - w1 as i64).rem_euclid(n);
  let q2 = (w3 as i64 - w2 as i64).rem_euclid(n);
  let val = w1 as u64 + (n as u64) * (q1 as u64) + (n as u64 * n as u64) * (q2 as u64);
  (val % (1u64 << 32)) as u32
}

fn checksum_index(words: &[String]) -> usize {
  let mut prefixes = String::with_capacity(words.len() * PREFIX_LEN);
  for word in words {
    prefixes.push_str(&word[.. PREFIX_LEN.min(word.len())]);
  }
  (crc32fast::hash(prefixes.as_bytes()) as usize) % ENTROPY_WORDS
}

/// Encode 32 bytes of entropy as a 25-word mnemonic.
pub fn encode(entropy: [u8; 32]) -> Vec<String> {
  let mut words = Vec::with_capacity(TOTAL_WORDS);
  for chunk in entropy.chunks(4) {
    let x = u32::from_le_bytes(chunk.try_into().unwrap());
    for index in pack_chunk(x) {
      words.push(wordlist::word(index).expect("packed index is always in range").to_string());
    }
  }
  debug_assert_eq!(words.len(), ENTROPY_WORDS);

  let checksum_word = words[checksum_index(&words)].clone();
  words.push(checksum_word);
  words
}

/// Decode a 25-word mnemonic back to its 32 bytes of entropy, verifying the checksum word.
pub fn decode(words: &[String]) -> Result<[u8; 32], MnemonicError> {
  if words.len() != TOTAL_WORDS {
    return Err(MnemonicError::WrongWordCount(words.len()));
  }

  let entropy_words = &words[.. ENTROPY_WORDS];
  if words[ENTROPY_WORDS] != entropy_words[checksum_index(entropy_words)] {
    return Err(MnemonicError::ChecksumMismatch);
  }

  let mut indices = Vec::with_capacity(ENTROPY_WORDS);
  for word in entropy_words {
    indices.push(wordlist::index_of(word).ok_or_else(|| MnemonicError::UnknownWord(word.clone()))?);
  }

  let mut entropy = [0u8; 32];
  for (chunk, triple) in entropy.chunks_mut(4).zip(indices.chunks(3)) {
    let x = unpack_chunk(triple[0], triple[1], triple[2]);
    chunk.copy_from_slice(&x.to_le_bytes());
  }
  Ok(entropy)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn round_trips_arbitrary_entropy() {
    for seed in [[0u8; 32], [0xff; 32], {
      let mut e = [0u8; 32];
      for (i, b) in e.iter_mut().enumerate() {
        *b = i as u8;
      }
      e
    }] {
      let words = encode(seed);
      assert_eq!(words.len(), TOTAL_WORDS);
      assert_eq!(decode(&words).unwrap(), seed);
    }
  }

  #[test]
  fn swapped_first_two_words_fails_checksum() {
    let mut words = encode([7u8; 32]);
    words.swap(0, 1);
    assert_eq!(decode(&words).unwrap_err(), MnemonicError::ChecksumMismatch);
  }

  #[test]
  fn wrong_length_is_rejected() {
    let words = vec!["x".to_string(); 24];
    assert_eq!(decode(&words).unwrap_err(), MnemonicError::WrongWordCount(24));
  }
}
