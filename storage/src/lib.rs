#![doc = "Password-encrypted at-rest wallet state: keys, scanned outputs and transactions, accounts, address book, and the sync checkpoint, backing a [`monero_wallet`](https://docs.rs/monero-wallet) instance between runs."]
#![deny(missing_docs)]

mod crypto;
mod document;
pub mod types;

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use subtle::ConstantTimeEq;
use tokio::sync::watch;
use zeroize::Zeroizing;

pub use document::DOCUMENT_VERSION;
pub use types::{Account, AddressBookEntry, Direction, EncryptedKeys, StoredOutput, StoredTransaction};

use document::{hex_key, Document};

/// An error opening, reading, or writing wallet storage.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
  /// The wallet file doesn't exist and the caller didn't ask to create one.
  #[error("wallet file not found at {0}")]
  NotFound(PathBuf),
  /// The wallet file already exists and the caller asked to create a new one.
  #[error("wallet file already exists at {0}")]
  AlreadyExists(PathBuf),
  /// The file was shorter than a salt and nonce, so it can't be a wallet file.
  #[error("wallet file is truncated")]
  Truncated,
  /// Key derivation failed.
  #[error("key derivation failed: {0}")]
  Kdf(String),
  /// Decryption failed, almost certainly because the password was wrong.
  #[error("decryption failed (wrong password?)")]
  Crypto,
  /// The decrypted document didn't parse.
  #[error("malformed wallet document: {0}")]
  Document(#[from] serde_json::Error),
  /// An I/O error occurred reading or writing the wallet file.
  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),
  /// The document's version is newer than this library understands.
  #[error("unsupported wallet document version {0}")]
  UnsupportedVersion(u32),
  /// An operation referenced a key image, hash, account, or address book id storage has no
  /// record of.
  #[error("no record found for the given key")]
  UnknownRecord,
}

/// Encrypted, file-backed storage for a single wallet's persistent state.
///
/// The file format is `salt(16) || nonce(12) || ciphertext_with_tag`: a password-derived
/// (Argon2id) key seals the entire [`Document`] as one ChaCha20-Poly1305-sealed blob. Every
/// mutating call reseals and atomically rewrites the file (write to a `.tmp` sibling, `fsync`,
/// then rename over the target), so a crash mid-write can never leave a half-written file in the
/// real path.
pub struct Storage {
  path: PathBuf,
  key: Zeroizing<[u8; 32]>,
  salt: [u8; crypto::SALT_LEN],
  document: Document,
  sync_height_tx: watch::Sender<u64>,
}

impl Storage {
  /// Open a wallet file at `path`, deriving its key from `password`.
  ///
  /// If `create` is true, no file may already exist at `path` — a fresh, empty wallet is created
  /// there, or [`StorageError::AlreadyExists`] if one does. If `create` is false, a file must
  /// already exist, or this returns [`StorageError::NotFound`].
  pub fn open(path: impl AsRef<Path>, password: &str, create: bool) -> Result<Self, StorageError> {
    let path = path.as_ref().to_path_buf();

    if create {
      if path.exists() {
        return Err(StorageError::AlreadyExists(path));
      }
      let salt = crypto::random_salt();
      let key = crypto::derive_key(password, &salt)?;
      let document = Document::default();
      let (tx, _) = watch::channel(document.sync_height);
      let mut storage = Self { path, key, salt, document, sync_height_tx: tx };
      storage.save()?;
      tracing::info!(path = %storage.path.display(), "created wallet storage");
      return Ok(storage);
    }

    if !path.exists() {
      return Err(StorageError::NotFound(path));
    }

    let bytes = fs::read(&path)?;
    if bytes.len() < crypto::SALT_LEN + crypto::NONCE_LEN {
      return Err(StorageError::Truncated);
    }
    let (salt_bytes, rest) = bytes.split_at(crypto::SALT_LEN);
    let (nonce_bytes, sealed) = rest.split_at(crypto::NONCE_LEN);
    let salt: [u8; crypto::SALT_LEN] = salt_bytes.try_into().expect("split at SALT_LEN");
    let nonce: [u8; crypto::NONCE_LEN] = nonce_bytes.try_into().expect("split at NONCE_LEN");

    let key = crypto::derive_key(password, &salt)?;
    let plaintext = crypto::open(&key, &nonce, sealed)?;
    let document: Document = serde_json::from_slice(&plaintext)?;
    if document.version > DOCUMENT_VERSION {
      return Err(StorageError::UnsupportedVersion(document.version));
    }

    let (tx, _) = watch::channel(document.sync_height);
    Ok(Self { path, key, salt, document, sync_height_tx: tx })
  }

  /// Close this wallet. Equivalent to dropping it; the key material is zeroized either way.
  pub fn close(self) {}

  /// Change the wallet's password, rewriting the file under a freshly derived key and salt.
  ///
  /// Fails without modifying the file if `old_password` doesn't match the currently open key.
  pub fn change_password(&mut self, old_password: &str, new_password: &str) -> Result<(), StorageError> {
    let check = crypto::derive_key(old_password, &self.salt)?;
    if !bool::from(check.ct_eq(&*self.key)) {
      return Err(StorageError::Crypto);
    }

    let new_salt = crypto::random_salt();
    let new_key = crypto::derive_key(new_password, &new_salt)?;
    self.salt = new_salt;
    self.key = new_key;
    self.save()?;
    tracing::info!("wallet password changed");
    Ok(())
  }

  #[tracing::instrument(level = "trace", skip_all)]
  fn save(&mut self) -> Result<(), StorageError> {
    let plaintext = serde_json::to_vec(&self.document)?;
    let nonce = crypto::random_nonce();
    let sealed = crypto::seal(&self.key, &nonce, &plaintext)?;

    let mut out = Vec::with_capacity(crypto::SALT_LEN + crypto::NONCE_LEN + sealed.len());
    out.extend_from_slice(&self.salt);
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&sealed);

    let tmp_path = self.path.with_extension("tmp");
    let mut tmp = File::create(&tmp_path)?;
    tmp.write_all(&out)?;
    tmp.sync_all()?;
    drop(tmp);
    fs::rename(&tmp_path, &self.path)?;

    let _ = self.sync_height_tx.send(self.document.sync_height);
    Ok(())
  }

  // --- keys ---

  /// The wallet's key material, if set.
  pub fn get_keys(&self) -> Option<&EncryptedKeys> {
    self.document.keys.as_ref()
  }

  /// Store the wallet's key material, replacing any previously stored record.
  pub fn put_keys(&mut self, keys: EncryptedKeys) -> Result<(), StorageError> {
    self.document.keys = Some(keys);
    self.save()
  }

  /// Remove the wallet's stored key material.
  pub fn delete_keys(&mut self) -> Result<(), StorageError> {
    self.document.keys = None;
    self.save()
  }

  // --- sync height ---

  /// The last blockchain height this wallet has fully synced through.
  pub fn sync_height(&self) -> u64 {
    self.document.sync_height
  }

  /// Record a new synced height. Heights are expected to be monotonically non-decreasing except
  /// when a reorg calls [`Self::rollback_to`] first.
  pub fn set_sync_height(&mut self, height: u64) -> Result<(), StorageError> {
    self.document.sync_height = height;
    self.save()
  }

  /// Record a new synced height together with the hash of the block at that height, as observed
  /// from the daemon. This is the call the sync loop makes after each block; the hash lets a
  /// later pass detect a reorg by re-comparing it against what the daemon reports then.
  pub fn set_sync_height_and_hash(&mut self, height: u64, block_hash: [u8; 32]) -> Result<(), StorageError> {
    self.document.sync_height = height;
    self.document.block_hashes.insert(height, block_hash);
    self.save()
  }

  /// The hash this wallet observed for the block at `height`, if it's synced that far.
  pub fn get_block_hash(&self, height: u64) -> Option<[u8; 32]> {
    self.document.block_hashes.get(&height).copied()
  }

  /// Subscribe to sync height updates. The new subscriber immediately observes the
  /// currently-stored height (replayed), then every subsequent commit.
  pub fn watch_sync_height(&self) -> watch::Receiver<u64> {
    self.sync_height_tx.subscribe()
  }

  // --- outputs ---

  /// Look up a scanned output by its key image.
  pub fn get_output(&self, key_image: &[u8; 32]) -> Option<&StoredOutput> {
    self.document.outputs.get(&hex_key(key_image))
  }

  /// Insert or replace a scanned output, keyed by its key image.
  pub fn put_output(&mut self, output: StoredOutput) -> Result<(), StorageError> {
    self.document.outputs.insert(hex_key(&output.key_image), output);
    self.save()
  }

  /// Permanently remove an output record (a prune, not an ordinary spend).
  pub fn delete_output(&mut self, key_image: &[u8; 32]) -> Result<(), StorageError> {
    self.document.outputs.remove(&hex_key(key_image));
    self.save()
  }

  /// Every stored output.
  pub fn list_outputs(&self) -> impl Iterator<Item = &StoredOutput> {
    self.document.outputs.values()
  }

  /// Mark an output spent by `spending_transaction_hash`. Does not touch the output's key image
  /// or any other identifying field.
  pub fn mark_output_spent(
    &mut self,
    key_image: &[u8; 32],
    spending_transaction_hash: [u8; 32],
  ) -> Result<(), StorageError> {
    let output =
      self.document.outputs.get_mut(&hex_key(key_image)).ok_or(StorageError::UnknownRecord)?;
    output.spent = true;
    output.spending_transaction_hash = Some(spending_transaction_hash);
    self.save()
  }

  /// Pin or unpin an output against automatic selection.
  pub fn set_output_frozen(&mut self, key_image: &[u8; 32], frozen: bool) -> Result<(), StorageError> {
    let output =
      self.document.outputs.get_mut(&hex_key(key_image)).ok_or(StorageError::UnknownRecord)?;
    output.frozen = frozen;
    self.save()
  }

  // --- transactions ---

  /// Look up a scanned transaction by its hash.
  pub fn get_transaction(&self, hash: &[u8; 32]) -> Option<&StoredTransaction> {
    self.document.transactions.get(&hex_key(hash))
  }

  /// Insert or replace a scanned transaction, keyed by its hash.
  pub fn put_transaction(&mut self, transaction: StoredTransaction) -> Result<(), StorageError> {
    self.document.transactions.insert(hex_key(&transaction.hash), transaction);
    self.save()
  }

  /// Remove a transaction record.
  pub fn delete_transaction(&mut self, hash: &[u8; 32]) -> Result<(), StorageError> {
    self.document.transactions.remove(&hex_key(hash));
    self.save()
  }

  /// Every stored transaction.
  pub fn list_transactions(&self) -> impl Iterator<Item = &StoredTransaction> {
    self.document.transactions.values()
  }

  /// Record that a previously mempool-only transaction has been confirmed at `height`.
  pub fn confirm_transaction(&mut self, hash: &[u8; 32], height: u64) -> Result<(), StorageError> {
    let transaction =
      self.document.transactions.get_mut(&hex_key(hash)).ok_or(StorageError::UnknownRecord)?;
    transaction.height = Some(height);
    self.save()
  }

  /// Attach or clear a note on a transaction.
  pub fn set_tx_note(&mut self, hash: &[u8; 32], note: Option<String>) -> Result<(), StorageError> {
    let transaction =
      self.document.transactions.get_mut(&hex_key(hash)).ok_or(StorageError::UnknownRecord)?;
    transaction.note = note;
    self.save()
  }

  /// Read a transaction's note, if any.
  pub fn get_tx_note(&self, hash: &[u8; 32]) -> Option<&str> {
    self.document.transactions.get(&hex_key(hash))?.note.as_deref()
  }

  // --- accounts ---

  /// Look up an account by index.
  pub fn get_account(&self, index: u32) -> Option<&Account> {
    self.document.accounts.get(&index)
  }

  /// Insert or replace an account record.
  pub fn put_account(&mut self, account: Account) -> Result<(), StorageError> {
    self.document.accounts.insert(account.index, account);
    self.save()
  }

  /// Every stored account, ascending by index.
  pub fn list_accounts(&self) -> impl Iterator<Item = &Account> {
    self.document.accounts.values()
  }

  /// Label a subaddress under `account`, extending its label list if `minor` is past its current
  /// end.
  pub fn set_subaddress_label(
    &mut self,
    account: u32,
    minor: u32,
    label: Option<String>,
  ) -> Result<(), StorageError> {
    let account =
      self.document.accounts.get_mut(&account).ok_or(StorageError::UnknownRecord)?;
    let minor = minor as usize;
    if account.subaddress_labels.len() <= minor {
      account.subaddress_labels.resize(minor + 1, None);
    }
    account.subaddress_labels[minor] = label;
    self.save()
  }

  // --- address book ---

  /// Add an address book entry, returning its freshly assigned monotonic id.
  pub fn add_address_book_entry(
    &mut self,
    address: String,
    label: Option<String>,
    payment_id: Option<[u8; 8]>,
  ) -> Result<u64, StorageError> {
    let id = self.document.next_address_book_id;
    self.document.next_address_book_id += 1;
    self.document.address_book.insert(id, AddressBookEntry { id, address, label, payment_id });
    self.save()?;
    Ok(id)
  }

  /// Look up an address book entry by id.
  pub fn get_address_book_entry(&self, id: u64) -> Option<&AddressBookEntry> {
    self.document.address_book.get(&id)
  }

  /// Remove an address book entry.
  pub fn delete_address_book_entry(&mut self, id: u64) -> Result<(), StorageError> {
    self.document.address_book.remove(&id);
    self.save()
  }

  /// Every address book entry, ascending by id.
  pub fn list_address_book(&self) -> impl Iterator<Item = &AddressBookEntry> {
    self.document.address_book.values()
  }

  // --- reorg support ---

  /// Roll persisted state back to `height`, undoing everything a reorg invalidated: the sync
  /// checkpoint, any remembered block hash above `height`, any transaction confirmed above
  /// `height` (demoted back to mempool), and the spent flag on any output whose spending
  /// transaction was itself just demoted.
  ///
  /// The sync manager calls this before re-scanning forward from the fork point; it does not
  /// itself re-derive anything a forward re-scan will recompute.
  pub fn rollback_to(&mut self, height: u64) -> Result<(), StorageError> {
    let mut demoted = Vec::new();
    for transaction in self.document.transactions.values_mut() {
      if let Some(confirmed_at) = transaction.height {
        if confirmed_at > height {
          transaction.height = None;
          demoted.push(transaction.hash);
        }
      }
    }

    for output in self.document.outputs.values_mut() {
      if let Some(confirmed_at) = output.confirmation_height {
        if confirmed_at > height {
          output.confirmation_height = None;
        }
      }
      if output.spent {
        if let Some(spending_tx) = output.spending_transaction_hash {
          if demoted.contains(&spending_tx) {
            output.spent = false;
            output.spending_transaction_hash = None;
          }
        }
      }
    }

    self.document.sync_height = height;
    self.document.block_hashes.retain(|&synced_height, _| synced_height <= height);
    tracing::warn!(height, demoted = demoted.len(), "rolled back storage for a reorg");
    self.save()
  }
}

#[cfg(test)]
mod tests {
  use tempfile::TempDir;

  use super::*;

  fn sample_output(key_image: [u8; 32]) -> StoredOutput {
    StoredOutput {
      key_image,
      output_key: [1; 32],
      commitment_mask: [2; 32],
      amount: "1000000000000".into(),
      global_index: 42,
      transaction_hash: [3; 32],
      index_in_transaction: 0,
      confirmation_height: Some(100),
      account: 0,
      subaddress: 0,
      spent: false,
      spending_transaction_hash: None,
      frozen: false,
      unlock_time: 0,
    }
  }

  #[test]
  fn create_then_reopen_round_trips() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("wallet.dat");

    let mut storage = Storage::open(&path, "hunter2", true).unwrap();
    storage.put_output(sample_output([9; 32])).unwrap();
    storage.set_sync_height(12345).unwrap();
    drop(storage);

    let reopened = Storage::open(&path, "hunter2", false).unwrap();
    assert_eq!(reopened.sync_height(), 12345);
    assert!(reopened.get_output(&[9; 32]).is_some());
  }

  #[test]
  fn wrong_password_fails_to_open() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("wallet.dat");
    Storage::open(&path, "hunter2", true).unwrap();
    assert!(matches!(Storage::open(&path, "wrong", false), Err(StorageError::Crypto)));
  }

  #[test]
  fn missing_file_without_create_is_not_found() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("wallet.dat");
    assert!(matches!(Storage::open(&path, "hunter2", false), Err(StorageError::NotFound(_))));
  }

  #[test]
  fn change_password_then_reopen_with_new_password() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("wallet.dat");
    let mut storage = Storage::open(&path, "old", true).unwrap();
    storage.change_password("old", "new").unwrap();
    drop(storage);

    assert!(matches!(Storage::open(&path, "old", false), Err(StorageError::Crypto)));
    assert!(Storage::open(&path, "new", false).is_ok());
  }

  #[test]
  fn rollback_demotes_transactions_and_unspends_their_outputs() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("wallet.dat");
    let mut storage = Storage::open(&path, "hunter2", true).unwrap();

    let tx_hash = [5; 32];
    storage
      .put_transaction(StoredTransaction {
        hash: tx_hash,
        height: Some(200),
        timestamp: 0,
        fee: 0,
        direction: Direction::Outgoing,
        account: 0,
        subaddresses: vec![0],
        net_amount: "-1000".into(),
        payment_id: None,
        note: None,
      })
      .unwrap();

    let mut output = sample_output([9; 32]);
    output.spent = true;
    output.spending_transaction_hash = Some(tx_hash);
    storage.put_output(output).unwrap();
    storage.set_sync_height(250).unwrap();

    storage.rollback_to(150).unwrap();

    assert_eq!(storage.sync_height(), 150);
    assert_eq!(storage.get_transaction(&tx_hash).unwrap().height, None);
    let output = storage.get_output(&[9; 32]).unwrap();
    assert!(!output.spent);
    assert_eq!(output.spending_transaction_hash, None);
  }

  #[test]
  fn block_hashes_are_pruned_above_a_rollback_height() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("wallet.dat");
    let mut storage = Storage::open(&path, "hunter2", true).unwrap();

    storage.set_sync_height_and_hash(100, [1; 32]).unwrap();
    storage.set_sync_height_and_hash(101, [2; 32]).unwrap();
    storage.set_sync_height_and_hash(102, [3; 32]).unwrap();

    storage.rollback_to(100).unwrap();

    assert_eq!(storage.get_block_hash(100), Some([1; 32]));
    assert_eq!(storage.get_block_hash(101), None);
    assert_eq!(storage.get_block_hash(102), None);
  }

  #[test]
  fn watch_sync_height_replays_the_current_value() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("wallet.dat");
    let mut storage = Storage::open(&path, "hunter2", true).unwrap();
    storage.set_sync_height(999).unwrap();

    let receiver = storage.watch_sync_height();
    assert_eq!(*receiver.borrow(), 999);
  }
}
