use monero_wallet_primitives::Scalar;

use crate::output::WalletOutput;

/// The protocol-mandated minimum number of confirmations before an output may be spent.
pub const MINIMUM_CONFIRMATIONS: usize = 10;
/// The maximum number of inputs a single transaction may spend, matching the ring size cap this
/// library targets.
pub const MAX_INPUTS: usize = 16;

/// How [`select`] orders candidate outputs before greedily accumulating them.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum SelectionStrategy {
  /// Spend the smallest eligible outputs first, consolidating dust.
  #[default]
  SmallestFirst,
  /// Spend the largest eligible outputs first, minimizing the input count.
  LargestFirst,
  /// Spend outputs ascending by distance from the target amount, falling back to accumulation
  /// only if no single output suffices.
  ClosestMatch,
  /// Spend outputs in a caller-supplied random order.
  Random,
}

/// An output known to the wallet, annotated with the chain state needed to judge its spendability.
#[derive(Clone, Debug)]
pub struct SpendableOutput {
  output: WalletOutput,
  block_height: usize,
  frozen: bool,
}

impl SpendableOutput {
  /// Wrap a scanned output with its containing block height and frozen flag.
  pub fn new(output: WalletOutput, block_height: usize, frozen: bool) -> Self {
    Self { output, block_height, frozen }
  }

  /// The wrapped output.
  pub fn output(&self) -> &WalletOutput {
    &self.output
  }

  /// The height of the block that confirmed this output.
  pub fn block_height(&self) -> usize {
    self.block_height
  }

  /// Whether a caller has pinned this output to prevent it from being automatically spent.
  pub fn frozen(&self) -> bool {
    self.frozen
  }

  fn amount(&self) -> u64 {
    self.output.commitment().amount
  }

  /// Whether this output may be selected to fund a spend at `current_height`, given
  /// `min_confirmations` (which must be at least [`MINIMUM_CONFIRMATIONS`]; callers wanting a more
  /// conservative policy may raise it).
  pub fn is_eligible(&self, current_height: usize, min_confirmations: usize, time: u64) -> bool {
    if self.frozen {
      return false;
    }
    if !self.output.additional_timelock().satisfied_by(current_height, time) {
      return false;
    }
    current_height.saturating_sub(self.block_height) >= min_confirmations
  }
}

/// The bytes a transaction's wire size grows by per additional input/output, and its fixed
/// overhead, used to estimate a fee before a transaction is actually assembled.
#[derive(Clone, Copy, Debug)]
pub struct FeeWeights {
  /// Bytes contributed by the prefix, RCT base, and bulletproof fixed overhead, independent of
  /// input/output count.
  pub overhead: u64,
  /// Additional bytes contributed by each input (its ring signature and offsets).
  pub per_input: u64,
  /// Additional bytes contributed by each output (its key, encrypted amount, and commitment).
  pub per_output: u64,
}

impl FeeWeights {
  /// Rough weights grounded in a typical 16-ring CLSAG input and compact RingCT output.
  pub const TYPICAL: Self = Self { overhead: 200, per_input: 1500, per_output: 180 };

  /// Estimate a transaction's fee at `fee_per_byte`, given its input and output counts.
  pub fn estimate_fee(&self, fee_per_byte: u64, inputs: usize, outputs: usize) -> u64 {
    let weight = self.overhead +
      self.per_input * u64::try_from(inputs).unwrap_or(u64::MAX) +
      self.per_output * u64::try_from(outputs).unwrap_or(u64::MAX);
    weight.saturating_mul(fee_per_byte)
  }
}

/// The result of a successful [`select`] call.
#[derive(Clone, Debug)]
pub struct Selection {
  /// The outputs chosen to fund the spend.
  pub inputs: Vec<WalletOutput>,
  /// The fee these inputs must cover, computed from `fee_per_byte` and the final input/output
  /// counts.
  pub fee: u64,
  /// Whatever remains after the spend amount and fee are subtracted from the inputs' total,
  /// destined for a change output.
  pub change: u64,
}

fn sort_candidates(
  candidates: &mut [SpendableOutput],
  strategy: SelectionStrategy,
  target: u64,
) {
  match strategy {
    SelectionStrategy::SmallestFirst => candidates.sort_by_key(SpendableOutput::amount),
    SelectionStrategy::LargestFirst => candidates.sort_by_key(|c| std::cmp::Reverse(c.amount())),
    SelectionStrategy::Random => {}
    SelectionStrategy::ClosestMatch => candidates.sort_by_key(|c| c.amount().abs_diff(target)),
  }
}

/// Select inputs to fund a spend of `target_amount` (plus fee) from `candidates`, which the
/// caller has already filtered to outputs eligible at the intended spend height (see
/// [`SpendableOutput::is_eligible`]).
///
/// Outputs are ordered per `strategy` and accumulated greedily, up to `max_inputs` (itself capped
/// at [`MAX_INPUTS`]), recomputing the fee as the input count grows. Returns `None` if no subset
/// of at most `max_inputs` candidates covers the target plus its own fee — this is an ordinary,
/// expected outcome (insufficient funds), not an error.
pub fn select(
  candidates: &[SpendableOutput],
  strategy: SelectionStrategy,
  target_amount: u64,
  destination_outputs: usize,
  max_inputs: usize,
  fee_per_byte: u64,
  weights: FeeWeights,
) -> Option<Selection> {
  let max_inputs = max_inputs.min(MAX_INPUTS);
  let mut ordered: Vec<SpendableOutput> = candidates.to_vec();
  sort_candidates(&mut ordered, strategy, target_amount);

  // A change output is assumed present until proven otherwise, so the fee estimate never
  // undercounts the transaction this selection will actually build.
  let outputs_with_change = destination_outputs + 1;

  let mut accumulated = 0u64;
  let mut chosen = Vec::new();
  for candidate in ordered {
    if chosen.len() >= max_inputs {
      break;
    }
    accumulated += candidate.amount();
    chosen.push(candidate.output);

    let fee = weights.estimate_fee(fee_per_byte, chosen.len(), outputs_with_change);
    if let Some(change) = accumulated.checked_sub(target_amount + fee) {
      return Some(Selection { inputs: chosen, fee, change });
    }
  }

  None
}

/// Select every eligible candidate to sweep the wallet's entire spendable balance to a single
/// destination, leaving no change.
///
/// Returns `None` if `candidates` is empty, exceeds [`MAX_INPUTS`], or the fee would consume the
/// entire swept amount.
pub fn sweep_all(
  candidates: &[SpendableOutput],
  fee_per_byte: u64,
  weights: FeeWeights,
) -> Option<Selection> {
  if candidates.is_empty() || candidates.len() > MAX_INPUTS {
    return None;
  }

  let total: u64 = candidates.iter().map(SpendableOutput::amount).sum();
  let fee = weights.estimate_fee(fee_per_byte, candidates.len(), 1);
  let swept = total.checked_sub(fee)?;
  if swept == 0 {
    return None;
  }

  Some(Selection {
    inputs: candidates.iter().map(|c| c.output.clone()).collect(),
    fee,
    change: 0,
  })
}

/// Reconstruct the scalar sum of a selection's input key offsets, for callers building a spend
/// proof over multiple inputs from the same subaddress.
pub fn sum_key_offsets(inputs: &[WalletOutput]) -> Scalar {
  inputs.iter().fold(Scalar::ZERO, |acc, input| acc + input.key_offset())
}

#[cfg(test)]
mod tests {
  use monero_wallet_primitives::{Commitment, CompressedPoint};

  use crate::output::{AbsoluteId, Metadata, OutputData, RelativeId};
  use crate::transaction::Timelock;

  use super::*;

  fn candidate(amount: u64, block_height: usize) -> SpendableOutput {
    let output = WalletOutput::new(
      AbsoluteId { transaction: [0; 32], index_in_transaction: 0 },
      Some(RelativeId { index_on_blockchain: 1 }),
      OutputData { key: CompressedPoint::G, key_offset: Scalar::ZERO, commitment: Commitment::new(Scalar::ONE, amount) },
      Metadata { additional_timelock: Timelock::None, ..Metadata::default() },
    );
    SpendableOutput::new(output, block_height, false)
  }

  #[test]
  fn eligibility_requires_confirmations() {
    let output = candidate(1000, 100);
    assert!(!output.is_eligible(105, MINIMUM_CONFIRMATIONS, 0));
    assert!(output.is_eligible(110, MINIMUM_CONFIRMATIONS, 0));
  }

  #[test]
  fn frozen_outputs_are_never_eligible() {
    let mut output = candidate(1000, 0);
    output.frozen = true;
    assert!(!output.is_eligible(1_000_000, MINIMUM_CONFIRMATIONS, 0));
  }

  #[test]
  fn smallest_first_accumulates_until_the_target_is_covered() {
    let candidates = vec![candidate(500, 0), candidate(2000, 0), candidate(800, 0)];
    let selection = select(
      &candidates,
      SelectionStrategy::SmallestFirst,
      1000,
      1,
      MAX_INPUTS,
      1,
      FeeWeights::TYPICAL,
    )
    .unwrap();
    assert_eq!(selection.inputs.len(), 2);
    assert_eq!(selection.inputs[0].commitment().amount, 500);
  }

  #[test]
  fn insufficient_funds_returns_none_not_an_error() {
    let candidates = vec![candidate(10, 0)];
    assert!(select(&candidates, SelectionStrategy::SmallestFirst, 1_000_000, 1, MAX_INPUTS, 1, FeeWeights::TYPICAL)
      .is_none());
  }

  #[test]
  fn sweep_all_leaves_no_change() {
    let candidates = vec![candidate(1000, 0), candidate(2000, 0)];
    let selection = sweep_all(&candidates, 1, FeeWeights::TYPICAL).unwrap();
    assert_eq!(selection.change, 0);
    assert_eq!(selection.inputs.len(), 2);
  }
}
