use std::collections::HashSet;
use std::ops::Range;

use rand::Rng;
use rand_core::{CryptoRng, RngCore};
use rand_distr::{Distribution, Gamma};

use monero_wallet_primitives::Point;
use monero_wallet_rpc::{DecoyRpc, RpcError};

use crate::output::WalletOutput;

/// Ring members per input, fixed by consensus from the Bulletproof+ hardfork onward.
pub const RING_SIZE: usize = 16;
/// The minimum age, in blocks, a decoy candidate must have, absent a caller override.
pub const DEFAULT_MIN_DECOY_AGE: usize = 10;

const BLOCK_TIME_SECONDS: u64 = 120;
const BLOCKS_PER_DAY: f64 = (24 * 60 * 60) as f64 / BLOCK_TIME_SECONDS as f64;
const GAMMA_SHAPE: f64 = 19.28;
const GAMMA_SCALE: f64 = 1.0 / 1.61;
const MAX_SAMPLING_ATTEMPTS: usize = 100;

/// An error assembling a ring of decoys for an input.
#[derive(Clone, PartialEq, Eq, Debug, thiserror::Error)]
pub enum DecoyError {
  /// The output being spent has no known position in the blockchain's global output index, so no
  /// ring can be built around it.
  #[error("the output being spent has no known blockchain index")]
  MissingGlobalIndex,
  /// Even after falling back to uniform sampling across the entire output space, a full ring
  /// couldn't be assembled (the chain doesn't yet have enough eligible outputs).
  #[error("not enough decoy candidates are available")]
  InsufficientDecoys,
  /// The daemon collaborator's output-distribution oracle failed or returned something
  /// inconsistent.
  #[error(transparent)]
  Rpc(#[from] RpcError),
}

/// A single ring member: its position in the blockchain's global RingCT output index, one-time
/// public key, and Pedersen commitment.
#[derive(Clone, Copy, Debug)]
pub struct RingMember {
  /// The output's global index.
  pub global_index: u64,
  /// The output's one-time public key.
  pub key: Point,
  /// The output's Pedersen commitment.
  pub commitment: Point,
}

/// A complete ring for a single input: the real output plus its decoys, sorted ascending by
/// global index.
#[derive(Clone, Debug)]
pub struct Decoys {
  ring: Vec<RingMember>,
  real_index: usize,
}

impl Decoys {
  /// The ring's members, ascending by global index.
  pub fn ring(&self) -> &[RingMember] {
    &self.ring
  }

  /// The real spend's position within [`Self::ring`].
  pub fn real_index(&self) -> usize {
    self.real_index
  }

  #[cfg(test)]
  pub(crate) fn for_test(ring: Vec<RingMember>, real_index: usize) -> Self {
    Self { ring, real_index }
  }

  /// The ring members' global indices, encoded as the first-absolute-then-relative deltas the
  /// wire format uses.
  pub fn offsets(&self) -> Vec<u64> {
    let mut offsets = Vec::with_capacity(self.ring.len());
    offsets.push(self.ring[0].global_index);
    for m in 1 .. self.ring.len() {
      offsets.push(self.ring[m].global_index - self.ring[m - 1].global_index);
    }
    offsets
  }
}

/// Find the half-open range of global output indices block `height` contributed, per a
/// cumulative output-count distribution indexed by height.
fn block_output_range(distribution: &[u64], height: usize) -> Option<Range<u64>> {
  let upper = *distribution.get(height)?;
  let lower = if height == 0 { 0 } else { *distribution.get(height - 1)? };
  (upper > lower).then_some(lower .. upper)
}

/// Select decoys for `real`, whose recognized position on the blockchain must already be known
/// (i.e. it was scanned with `output_indexes` supplied).
///
/// Samples `ring_len - 1` decoy ages from a gamma distribution over output age, converts each
/// age-in-days to a target block height at Monero's ~2-minute block time, and picks a uniformly
/// random output within that block's contribution. Candidates younger than `min_decoy_age` or
/// duplicating a prior pick are rejected. After [`MAX_SAMPLING_ATTEMPTS`] rounds, remaining slots
/// fall back to uniform sampling across the whole eligible output space.
pub async fn select_decoys<R: RngCore + CryptoRng>(
  rng: &mut R,
  rpc: &impl DecoyRpc,
  ring_len: usize,
  height: usize,
  min_decoy_age: usize,
  real: &WalletOutput,
) -> Result<Decoys, DecoyError> {
  let real_index = real.index_on_blockchain().ok_or(DecoyError::MissingGlobalIndex)?;

  let end_height = rpc.get_output_distribution_end_height().await?;
  let query_height = height.min(end_height);
  let distribution = rpc.get_output_distribution(0 .. query_height).await?;

  let eligible_height = query_height.saturating_sub(min_decoy_age);
  let eligible_outputs = distribution.get(eligible_height).copied().unwrap_or(0);
  if eligible_outputs < ring_len as u64 {
    return Err(DecoyError::InsufficientDecoys);
  }

  let gamma = Gamma::<f64>::new(GAMMA_SHAPE, GAMMA_SCALE).expect("fixed gamma parameters are valid");

  let mut chosen = HashSet::new();
  chosen.insert(real_index);

  let decoy_count = ring_len - 1;
  let mut attempts = 0;
  while chosen.len() < decoy_count + 1 {
    attempts += 1;

    let candidate = if attempts <= MAX_SAMPLING_ATTEMPTS {
      let age_days = gamma.sample(rng);
      let age_blocks = (age_days * BLOCKS_PER_DAY).round() as usize;
      let target_height = query_height.saturating_sub(age_blocks).min(eligible_height);
      block_output_range(&distribution, target_height)
        .map(|range| rng.gen_range(range))
    } else {
      if attempts == MAX_SAMPLING_ATTEMPTS + 1 {
        tracing::debug!(
          chosen = chosen.len(),
          decoy_count,
          "gamma sampling exhausted its attempt budget, falling back to uniform sampling"
        );
      }
      (eligible_outputs > 0).then(|| rng.gen_range(0 .. eligible_outputs))
    };

    match candidate {
      Some(index) if !chosen.contains(&index) => {
        chosen.insert(index);
      }
      Some(_) => {}
      None if attempts > MAX_SAMPLING_ATTEMPTS * 2 => return Err(DecoyError::InsufficientDecoys),
      None => {}
    }
  }

  let decoy_indices: Vec<u64> = chosen.iter().copied().filter(|i| *i != real_index).collect();
  let fetched = rpc.get_unlocked_outputs(&decoy_indices, query_height, false).await?;

  let mut ring = Vec::with_capacity(ring_len);
  ring.push(RingMember {
    global_index: real_index,
    key: real.key().decompress().ok_or(DecoyError::InsufficientDecoys)?,
    commitment: real.commitment().compress().decompress().ok_or(DecoyError::InsufficientDecoys)?,
  });
  for (index, entry) in decoy_indices.iter().zip(fetched) {
    let Some([key, commitment]) = entry else { continue };
    ring.push(RingMember { global_index: *index, key, commitment });
  }

  if ring.len() < ring_len {
    return Err(DecoyError::InsufficientDecoys);
  }
  ring.sort_by_key(|member| member.global_index);

  let real_index =
    ring.iter().position(|member| member.global_index == real_index).expect("real output was inserted into the ring above");

  Ok(Decoys { ring, real_index })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn block_output_range_accounts_for_the_genesis_block() {
    let distribution = vec![3, 5, 5, 9];
    assert_eq!(block_output_range(&distribution, 0), Some(0 .. 3));
    assert_eq!(block_output_range(&distribution, 1), Some(3 .. 5));
    assert_eq!(block_output_range(&distribution, 2), None);
    assert_eq!(block_output_range(&distribution, 3), Some(5 .. 9));
  }

  #[test]
  fn offsets_delta_encode_ascending_global_indices() {
    let member = |i: u64| RingMember {
      global_index: i,
      key: Point::hash_to_point([0; 32]),
      commitment: Point::hash_to_point([1; 32]),
    };
    let decoys = Decoys { ring: vec![member(5), member(9), member(30)], real_index: 1 };
    assert_eq!(decoys.offsets(), vec![5, 4, 21]);
  }
}
