use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{Account, AddressBookEntry, EncryptedKeys, StoredOutput, StoredTransaction};

/// The document format's current version. Bumped whenever a field is added or reinterpreted in
/// a way an older reader couldn't safely ignore.
pub const DOCUMENT_VERSION: u32 = 1;

/// The wallet's entire persisted state, as it exists once decrypted. This is the structure
/// [`crate::Storage`] seals and unseals as a whole; individual records aren't separately
/// addressable on disk.
#[derive(Clone, Serialize, Deserialize)]
pub struct Document {
  /// The document format's version.
  pub version: u32,
  /// The wallet's key material, absent until [`crate::Storage::put_keys`] is called.
  pub keys: Option<EncryptedKeys>,
  /// The last blockchain height this wallet has fully synced through.
  pub sync_height: u64,
  /// The hash of every synced block, keyed by height, as observed at sync time. Kept so a reorg
  /// can be detected by comparing the daemon's hash at a height against what was actually synced,
  /// and so the fork point can be found by walking backward through heights already agreed on.
  pub block_hashes: BTreeMap<u64, [u8; 32]>,
  /// Scanned outputs, keyed by hex-encoded key image.
  pub outputs: BTreeMap<String, StoredOutput>,
  /// Scanned transactions, keyed by hex-encoded hash.
  pub transactions: BTreeMap<String, StoredTransaction>,
  /// Wallet accounts, keyed by account index.
  pub accounts: BTreeMap<u32, Account>,
  /// Address book entries, keyed by their monotonic id.
  pub address_book: BTreeMap<u64, AddressBookEntry>,
  /// The next id [`crate::Storage::add_address_book_entry`] will assign.
  pub next_address_book_id: u64,
}

impl Default for Document {
  fn default() -> Self {
    Self {
      version: DOCUMENT_VERSION,
      keys: None,
      sync_height: 0,
      block_hashes: BTreeMap::new(),
      outputs: BTreeMap::new(),
      transactions: BTreeMap::new(),
      accounts: BTreeMap::new(),
      address_book: BTreeMap::new(),
      next_address_book_id: 0,
    }
  }
}

/// Hex-encode a 32-byte key for use as a document map key.
pub fn hex_key(bytes: &[u8; 32]) -> String {
  hex::encode(bytes)
}
