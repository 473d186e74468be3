//! State vectors: a transaction's position across the signaling planes.
//!
//! Projection is deterministic and side-effect-free. Non-protocol traffic
//! projects to a vector like any other transaction; it simply fails to match
//! anything in the dialect later.

use crate::observe::ObservedTx;

/// Minor units per whole coin.
pub const MINOR_UNITS_PER_COIN: u64 = 100_000_000;

/// Topology/symmetry plane value, derived from input/output counts and
/// output ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symmetry {
    /// Equal counts and outputs in canonical (ascending) order.
    Mirrored,
    Neutral,
    /// Counts differ by more than the dialect's threshold.
    Asymmetric,
}

/// One transaction's coordinates across the planes.
///
/// `value` and `fee` are integer minor units throughout; `block_delta` is
/// `None` for the first transaction of a stream (no reference point).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateVector {
    pub value: u64,
    pub fee: u64,
    pub in_count: u32,
    pub out_count: u32,
    pub block_delta: Option<i64>,
    pub symmetry: Symmetry,
    pub aux: Option<Vec<u8>>,
}

/// Projects observed transactions onto state vectors.
///
/// The only dialect-supplied knob is the symmetry threshold; everything else
/// is read straight off the transaction.
#[derive(Debug, Clone, Copy)]
pub struct Projector {
    symmetry_threshold: u32,
}

impl Projector {
    pub fn new(symmetry_threshold: u32) -> Self {
        Projector { symmetry_threshold }
    }

    /// Project `tx` relative to `prior_height` (the previous transaction in
    /// the same stream, if any).
    ///
    /// The value header is the smallest output amount: signal headers sit
    /// below change branches under the canonical ascending order. A
    /// transaction with no outputs projects to a zero header rather than
    /// failing; such vectors match nothing.
    pub fn project(&self, tx: &ObservedTx, prior_height: Option<u64>) -> StateVector {
        let value = tx.outputs.iter().map(|o| o.amount).min().unwrap_or(0);
        let in_count = tx.inputs.len() as u32;
        let out_count = tx.outputs.len() as u32;
        let block_delta = prior_height.map(|prior| tx.height as i64 - prior as i64);
        StateVector {
            value,
            fee: tx.fee,
            in_count,
            out_count,
            block_delta,
            symmetry: self.derive_symmetry(tx, in_count, out_count),
            aux: tx.aux.clone(),
        }
    }

    fn derive_symmetry(&self, tx: &ObservedTx, in_count: u32, out_count: u32) -> Symmetry {
        if in_count.abs_diff(out_count) > self.symmetry_threshold {
            return Symmetry::Asymmetric;
        }
        let ascending = tx
            .outputs
            .windows(2)
            .all(|pair| pair[0].amount <= pair[1].amount);
        if in_count == out_count && ascending {
            Symmetry::Mirrored
        } else {
            Symmetry::Neutral
        }
    }
}
