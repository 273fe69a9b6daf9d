use serde::{Deserialize, Serialize};

/// The direction funds moved in a [`StoredTransaction`], relative to this wallet.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum Direction {
  /// Funds were received.
  Incoming,
  /// Funds were sent (and, unless swept, partially returned as change).
  Outgoing,
}

/// An output this wallet has scanned and recognized as its own.
///
/// Identified by its key image, which never changes for the lifetime of the record — storage
/// only ever mutates an output's `spent`/`frozen` flags, and only ever removes one via an
/// explicit prune.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct StoredOutput {
  /// The output's key image, this record's primary key.
  pub key_image: [u8; 32],
  /// The output's one-time public key.
  pub output_key: [u8; 32],
  /// The commitment's blinding mask.
  pub commitment_mask: [u8; 32],
  /// The opened amount, as a decimal string (amounts may exceed what a JSON number safely
  /// carries).
  pub amount: String,
  /// The output's position in the blockchain's global RingCT output index.
  pub global_index: u64,
  /// The hash of the transaction that created this output.
  pub transaction_hash: [u8; 32],
  /// This output's index within that transaction.
  pub index_in_transaction: u64,
  /// The height that confirmed this output's transaction, `None` while it's still in the
  /// mempool.
  pub confirmation_height: Option<u64>,
  /// The account index this output was received into.
  pub account: u32,
  /// The subaddress index (within `account`) this output was received at.
  pub subaddress: u32,
  /// Whether this output has already been spent.
  pub spent: bool,
  /// The transaction that spent this output, if any.
  pub spending_transaction_hash: Option<[u8; 32]>,
  /// Whether a caller has pinned this output to prevent it from being automatically spent.
  pub frozen: bool,
  /// The output's unlock time (block height or Unix timestamp, per Monero's usual threshold
  /// convention), `0` if unlocked immediately upon confirmation.
  pub unlock_time: u64,
}

/// A transaction this wallet either sent or received, recognized by scanning.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct StoredTransaction {
  /// The transaction's hash, this record's primary key.
  pub hash: [u8; 32],
  /// The height that confirmed this transaction, `None` while it's in the mempool.
  pub height: Option<u64>,
  /// The transaction's Unix timestamp (block timestamp once confirmed, observed time otherwise).
  pub timestamp: u64,
  /// The transaction's fee.
  pub fee: u64,
  /// Whether this transaction moved funds into or out of the wallet.
  pub direction: Direction,
  /// The account this transaction is attributed to.
  pub account: u32,
  /// The subaddresses (within `account`) this transaction touched.
  pub subaddresses: Vec<u32>,
  /// The net amount this transaction moved, as a signed decimal string (positive incoming,
  /// negative outgoing, excluding change).
  pub net_amount: String,
  /// The transaction's payment ID, if any.
  pub payment_id: Option<[u8; 8]>,
  /// A caller-attached note.
  pub note: Option<String>,
}

/// A wallet account: a labeled group of subaddresses sharing one spend authority.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize, Default)]
pub struct Account {
  /// The account's index.
  pub index: u32,
  /// A caller-assigned label.
  pub label: Option<String>,
  /// Labels for each subaddress under this account, in minor-index order (index 0 is the
  /// account's primary address).
  pub subaddress_labels: Vec<Option<String>>,
}

/// The wallet's key material, encrypted at rest independently of the document's own envelope
/// (mirroring Monero's historic `.keys` file convention).
#[derive(Clone, Serialize, Deserialize)]
pub struct EncryptedKeys {
  /// The private spend key, sealed.
  pub encrypted_spend_key: Vec<u8>,
  /// The private view key, sealed.
  pub encrypted_view_key: Vec<u8>,
  /// The public spend key.
  pub public_spend: [u8; 32],
  /// The public view key.
  pub public_view: [u8; 32],
  /// The salt this record's own key derivation used.
  pub kdf_salt: [u8; 16],
  /// The nonce `encrypted_spend_key`/`encrypted_view_key` were sealed under.
  pub aead_nonce: [u8; 12],
}

/// An entry in the wallet's address book.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct AddressBookEntry {
  /// The entry's monotonically assigned id.
  pub id: u64,
  /// The recipient's address, in its usual Base58 text form.
  pub address: String,
  /// A caller-assigned label.
  pub label: Option<String>,
  /// The payment ID to attach when sending to this entry, if any.
  pub payment_id: Option<[u8; 8]>,
}
