//! UTXO planning: realize a target output pattern as a concrete spend plan.
//!
//! The planner is pure with respect to its coin argument: it selects and
//! returns, it never reserves or locks. Callers racing over the same coin set
//! must serialize planning or re-query between calls. Value conservation
//! holds exactly for every plan: `sum(inputs) == sum(outputs) + fee`, in
//! integer minor units.

use crate::ast::OutputOrder;
use crate::observe::OutPoint;

/// Default dust floor, minor units.
pub const DEFAULT_DUST_FLOOR: u64 = 10_000;

/// A spendable coin as reported by the coin source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coin {
    pub outpoint: OutPoint,
    pub amount: u64,
    pub confirmations: u32,
}

/// Where a planned input's funds come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FundingRef {
    /// A real, already-confirmed coin.
    Coin(OutPoint),
    /// The designated change output of an earlier frame in the same chain,
    /// not yet broadcast. Callers sequence broadcast and confirmation.
    PreviousChange { frame: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedInput {
    pub funding: FundingRef,
    pub amount: u64,
}

/// Role of a planned output within the pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanRole {
    /// Carries a requested pattern amount.
    Target,
    /// Change branch created to satisfy cardinality or return surplus.
    Change,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedOutput {
    pub amount: u64,
    pub role: PlanRole,
}

/// One planned, unsigned transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub inputs: Vec<PlannedInput>,
    pub outputs: Vec<PlannedOutput>,
    pub fee: u64,
    /// Index of the designated change output, when one exists. In a chain
    /// this output funds the next frame.
    pub change_index: Option<usize>,
}

impl Plan {
    pub fn input_total(&self) -> u64 {
        self.inputs.iter().map(|i| i.amount).sum()
    }

    pub fn output_total(&self) -> u64 {
        self.outputs.iter().map(|o| o.amount).sum()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("plan requires at least one target output")]
    EmptyTarget,
    #[error("insufficient funds: have {available}, need {required}")]
    InsufficientFunds { available: u64, required: u64 },
    #[error("{available} spendable coins available, plan requires {required} inputs")]
    InsufficientCoins { available: usize, required: u32 },
    #[error("output of {amount} would fall below dust floor {dust_floor}")]
    DustViolation { amount: u64, dust_floor: u64 },
    #[error("invalid chain frame spec: {0}")]
    InvalidFrameSpec(String),
}

/// Chain planning failure: which frame failed and why. The whole chain is
/// abandoned; no partial plans are returned.
#[derive(Debug, thiserror::Error)]
#[error("chain frame {frame} failed: {source}")]
pub struct ChainPlanError {
    pub frame: usize,
    #[source]
    pub source: PlanError,
}

/// One frame of a chain to plan.
#[derive(Debug, Clone)]
pub struct FrameSpec {
    /// Primary output amount (the frame's value header).
    pub value: u64,
    pub fee: u64,
    /// Input cardinality. Only the first frame may request more than one;
    /// later frames are funded by the previous frame's change.
    pub in_count: Option<u32>,
    /// Output cardinality.
    pub out_count: u32,
    pub order: OutputOrder,
}

/// Requested single-transaction pattern.
#[derive(Debug, Clone)]
pub struct PlanRequest<'a> {
    /// Ordered pattern amounts.
    pub target_outputs: &'a [u64],
    pub fee: u64,
    /// When set, exactly this many inputs are used (largest first).
    pub target_in_count: Option<u32>,
    /// Total output cardinality to realize, change branches included.
    pub target_out_count: u32,
    pub order: OutputOrder,
}

/// Stateless planner; holds only the dust floor.
#[derive(Debug, Clone, Copy)]
pub struct Planner {
    dust_floor: u64,
}

impl Planner {
    pub fn new(dust_floor: u64) -> Self {
        Planner { dust_floor }
    }

    pub fn dust_floor(&self) -> u64 {
        self.dust_floor
    }

    /// Plan a single transaction.
    ///
    /// Change handling: extra output slots are filled by splitting change as
    /// evenly as possible (any branch below the dust floor is a hard
    /// failure); zero change omits the change output entirely; surplus change
    /// with no free slot folds into the primary output so the promised
    /// cardinality holds.
    pub fn plan(&self, coins: &[Coin], req: &PlanRequest) -> Result<Plan, PlanError> {
        if req.target_outputs.is_empty() {
            return Err(PlanError::EmptyTarget);
        }
        for &amount in req.target_outputs {
            if amount < self.dust_floor {
                return Err(PlanError::DustViolation {
                    amount,
                    dust_floor: self.dust_floor,
                });
            }
        }

        let pattern_total: u64 = req.target_outputs.iter().sum();
        let required = pattern_total + req.fee;
        let selected = select_coins(coins, req.target_in_count, required)?;
        let selected_total: u64 = selected.iter().map(|c| c.amount).sum();
        let change = selected_total - required;

        let mut outputs: Vec<(u64, PlanRole, bool)> = req
            .target_outputs
            .iter()
            .map(|&amount| (amount, PlanRole::Target, false))
            .collect();

        // Exact-zero change omits the change output entirely; the plan is one
        // output short of the requested cardinality and that is a valid,
        // distinct outcome, not an error.
        let extra_slots = (req.target_out_count as usize).saturating_sub(outputs.len());
        if change > 0 && extra_slots > 0 {
            for branch in split_branches(change, extra_slots, self.dust_floor)? {
                outputs.push((branch, PlanRole::Change, false));
            }
            // Mark the first change branch as the designated change output.
            if let Some(slot) = outputs.iter_mut().find(|o| o.1 == PlanRole::Change) {
                slot.2 = true;
            }
        } else if change > 0 {
            outputs[0].0 += change;
        }

        Ok(assemble(selected_inputs(&selected), outputs, req.fee, req.order))
    }

    /// Plan a chained sequence of frames. Frame 1 spends real coins; each
    /// later frame spends the previous frame's designated change output as a
    /// virtual coin. Any failure aborts the whole chain and reports the
    /// failing frame's index.
    pub fn plan_chain(
        &self,
        coins: &[Coin],
        frames: &[FrameSpec],
    ) -> Result<Vec<Plan>, ChainPlanError> {
        if frames.is_empty() {
            return Err(ChainPlanError {
                frame: 0,
                source: PlanError::EmptyTarget,
            });
        }
        for (i, frame) in frames.iter().enumerate().skip(1) {
            if frame.in_count.map_or(false, |m| m > 1) {
                return Err(ChainPlanError {
                    frame: i,
                    source: PlanError::InvalidFrameSpec(
                        "only the first chain frame may request multiple inputs".to_string(),
                    ),
                });
            }
        }

        let total_required: u64 = frames.iter().map(|f| f.value + f.fee).sum();
        let selected = select_coins(coins, frames[0].in_count, total_required)
            .map_err(|source| ChainPlanError { frame: 0, source })?;
        let mut pool: u64 = selected.iter().map(|c| c.amount).sum();

        let mut plans = Vec::with_capacity(frames.len());
        for (i, frame) in frames.iter().enumerate() {
            let plan = self
                .plan_chain_frame(frame, i, frames, pool, &selected)
                .map_err(|source| ChainPlanError { frame: i, source })?;
            pool = plan
                .change_index
                .map(|idx| plan.outputs[idx].amount)
                .unwrap_or(0);
            plans.push(plan);
        }
        Ok(plans)
    }

    fn plan_chain_frame(
        &self,
        frame: &FrameSpec,
        index: usize,
        frames: &[FrameSpec],
        pool: u64,
        selected: &[Coin],
    ) -> Result<Plan, PlanError> {
        if frame.value < self.dust_floor {
            return Err(PlanError::DustViolation {
                amount: frame.value,
                dust_floor: self.dust_floor,
            });
        }
        let needed = frame.value + frame.fee;
        if pool < needed {
            return Err(PlanError::InsufficientFunds {
                available: pool,
                required: needed,
            });
        }
        let change = pool - needed;
        let remaining: u64 = frames[index + 1..].iter().map(|f| f.value + f.fee).sum();
        let last = index == frames.len() - 1;

        let mut outputs: Vec<(u64, PlanRole, bool)> =
            vec![(frame.value, PlanRole::Target, false)];

        if last {
            let branch_slots = frame.out_count.saturating_sub(1) as usize;
            if change > 0 && branch_slots > 0 {
                for branch in split_branches(change, branch_slots, self.dust_floor)? {
                    outputs.push((branch, PlanRole::Change, false));
                }
                if let Some(slot) = outputs.iter_mut().find(|o| o.1 == PlanRole::Change) {
                    slot.2 = true;
                }
            } else if change > 0 {
                outputs[0].0 += change;
            }
        } else {
            if frame.out_count < 2 {
                return Err(PlanError::InvalidFrameSpec(
                    "a non-final chain frame needs an output slot for its change link"
                        .to_string(),
                ));
            }
            if change < remaining {
                return Err(PlanError::InsufficientFunds {
                    available: change,
                    required: remaining,
                });
            }
            let branch_slots = (frame.out_count - 2) as usize;
            let continuation = if branch_slots > 0 {
                let surplus = change - remaining;
                for branch in split_branches(surplus, branch_slots, self.dust_floor)? {
                    outputs.push((branch, PlanRole::Change, false));
                }
                remaining
            } else {
                change
            };
            if continuation < self.dust_floor {
                return Err(PlanError::DustViolation {
                    amount: continuation,
                    dust_floor: self.dust_floor,
                });
            }
            outputs.push((continuation, PlanRole::Change, true));
        }

        let inputs = if index == 0 {
            selected_inputs(selected)
        } else {
            vec![PlannedInput {
                funding: FundingRef::PreviousChange { frame: index - 1 },
                amount: pool,
            }]
        };
        Ok(assemble(inputs, outputs, frame.fee, frame.order))
    }
}

impl Default for Planner {
    fn default() -> Self {
        Planner::new(DEFAULT_DUST_FLOOR)
    }
}

/// Select funding coins, largest first. With an explicit input count, exactly
/// that many coins are taken; otherwise first-fit until the sum covers.
fn select_coins(
    coins: &[Coin],
    target_in_count: Option<u32>,
    required: u64,
) -> Result<Vec<Coin>, PlanError> {
    let mut candidates: Vec<Coin> = coins.to_vec();
    candidates.sort_by(|a, b| b.amount.cmp(&a.amount));

    let selected: Vec<Coin> = match target_in_count {
        Some(m) => {
            if candidates.len() < m as usize {
                return Err(PlanError::InsufficientCoins {
                    available: candidates.len(),
                    required: m,
                });
            }
            candidates.truncate(m as usize);
            candidates
        }
        None => {
            let mut picked = Vec::new();
            let mut total = 0u64;
            for coin in candidates {
                total += coin.amount;
                picked.push(coin);
                if total >= required {
                    break;
                }
            }
            picked
        }
    };

    let total: u64 = selected.iter().map(|c| c.amount).sum();
    if total < required {
        return Err(PlanError::InsufficientFunds {
            available: total,
            required,
        });
    }
    Ok(selected)
}

fn selected_inputs(selected: &[Coin]) -> Vec<PlannedInput> {
    selected
        .iter()
        .map(|coin| PlannedInput {
            funding: FundingRef::Coin(coin.outpoint.clone()),
            amount: coin.amount,
        })
        .collect()
}

/// Split `change` into `slots` branches as evenly as possible; the last
/// branch absorbs the rounding remainder. Any branch below the dust floor is
/// a hard failure, never a silently dropped output.
fn split_branches(change: u64, slots: usize, dust_floor: u64) -> Result<Vec<u64>, PlanError> {
    let per = change / slots as u64;
    if per < dust_floor {
        return Err(PlanError::DustViolation {
            amount: per,
            dust_floor,
        });
    }
    let mut branches = vec![per; slots];
    branches[slots - 1] = change - per * (slots as u64 - 1);
    Ok(branches)
}

/// Order outputs and fix up the change index. Canonical order is amount
/// ascending with targets before change on ties; reversed is the mirror.
fn assemble(
    inputs: Vec<PlannedInput>,
    mut outputs: Vec<(u64, PlanRole, bool)>,
    fee: u64,
    order: OutputOrder,
) -> Plan {
    match order {
        OutputOrder::Canonical => {
            outputs.sort_by_key(|&(amount, role, _)| (amount, role_rank(role)));
        }
        OutputOrder::Reversed => {
            outputs.sort_by_key(|&(amount, role, _)| (std::cmp::Reverse(amount), role_rank(role)));
        }
    }
    let change_index = outputs.iter().position(|&(_, _, designated)| designated);
    Plan {
        inputs,
        outputs: outputs
            .into_iter()
            .map(|(amount, role, _)| PlannedOutput { amount, role })
            .collect(),
        fee,
        change_index,
    }
}

fn role_rank(role: PlanRole) -> u8 {
    match role {
        PlanRole::Target => 0,
        PlanRole::Change => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coins(amounts: &[u64]) -> Vec<Coin> {
        amounts
            .iter()
            .enumerate()
            .map(|(i, &amount)| Coin {
                outpoint: OutPoint::new(format!("coin-{i}"), 0),
                amount,
                confirmations: 6,
            })
            .collect()
    }

    fn conserves_value(plan: &Plan) {
        assert_eq!(plan.input_total(), plan.output_total() + plan.fee);
    }

    #[test]
    fn heartbeat_shape_three_in_three_out() {
        let planner = Planner::default();
        let plan = planner
            .plan(
                &coins(&[1_000_000_000, 1_000_000_000, 1_000_000_000]),
                &PlanRequest {
                    target_outputs: &[700_000_000],
                    fee: 21_000_000,
                    target_in_count: Some(3),
                    target_out_count: 3,
                    order: OutputOrder::Canonical,
                },
            )
            .expect("plan");
        assert_eq!(plan.inputs.len(), 3);
        assert_eq!(plan.outputs.len(), 3);
        conserves_value(&plan);
        // Canonical order puts the header first.
        assert_eq!(plan.outputs[0].amount, 700_000_000);
        let branch_total: u64 = plan.outputs[1..].iter().map(|o| o.amount).sum();
        assert_eq!(branch_total, 3_000_000_000 - 700_000_000 - 21_000_000);
    }

    #[test]
    fn greedy_selection_stops_when_covered() {
        let planner = Planner::default();
        let plan = planner
            .plan(
                &coins(&[50_000, 900_000_000, 200_000_000]),
                &PlanRequest {
                    target_outputs: &[700_000_000],
                    fee: 1_000_000,
                    target_in_count: None,
                    target_out_count: 2,
                    order: OutputOrder::Canonical,
                },
            )
            .expect("plan");
        assert_eq!(plan.inputs.len(), 1);
        conserves_value(&plan);
    }

    #[test]
    fn insufficient_funds_is_reported_with_totals() {
        let planner = Planner::default();
        let err = planner
            .plan(
                &coins(&[100_000, 100_000]),
                &PlanRequest {
                    target_outputs: &[700_000_000],
                    fee: 21_000_000,
                    target_in_count: None,
                    target_out_count: 2,
                    order: OutputOrder::Canonical,
                },
            )
            .unwrap_err();
        match err {
            PlanError::InsufficientFunds { available, required } => {
                assert_eq!(available, 200_000);
                assert_eq!(required, 721_000_000);
            }
            other => panic!("expected InsufficientFunds, got {other}"),
        }
    }

    #[test]
    fn dust_branch_is_a_hard_failure() {
        let planner = Planner::default();
        // Change of 12_000 split across 4 branches lands below the floor.
        let err = planner
            .plan(
                &coins(&[1_012_000]),
                &PlanRequest {
                    target_outputs: &[900_000],
                    fee: 100_000,
                    target_in_count: None,
                    target_out_count: 5,
                    order: OutputOrder::Canonical,
                },
            )
            .unwrap_err();
        assert!(matches!(err, PlanError::DustViolation { .. }));
    }

    #[test]
    fn exact_change_omits_the_change_output() {
        let planner = Planner::default();
        let plan = planner
            .plan(
                &coins(&[721_000_000]),
                &PlanRequest {
                    target_outputs: &[700_000_000],
                    fee: 21_000_000,
                    target_in_count: None,
                    target_out_count: 1,
                    order: OutputOrder::Canonical,
                },
            )
            .expect("plan");
        assert_eq!(plan.outputs.len(), 1);
        assert_eq!(plan.change_index, None);
        conserves_value(&plan);
    }

    #[test]
    fn exact_change_omits_even_a_requested_change_slot() {
        let planner = Planner::default();
        let plan = planner
            .plan(
                &coins(&[721_000_000]),
                &PlanRequest {
                    target_outputs: &[700_000_000],
                    fee: 21_000_000,
                    target_in_count: None,
                    target_out_count: 2,
                    order: OutputOrder::Canonical,
                },
            )
            .expect("zero change is a valid short plan");
        assert_eq!(plan.outputs.len(), 1);
        assert_eq!(plan.change_index, None);
        conserves_value(&plan);
    }

    #[test]
    fn surplus_with_saturated_cardinality_folds_into_primary() {
        let planner = Planner::default();
        let plan = planner
            .plan(
                &coins(&[800_000_000]),
                &PlanRequest {
                    target_outputs: &[700_000_000],
                    fee: 21_000_000,
                    target_in_count: None,
                    target_out_count: 1,
                    order: OutputOrder::Canonical,
                },
            )
            .expect("plan");
        assert_eq!(plan.outputs.len(), 1);
        assert_eq!(plan.outputs[0].amount, 779_000_000);
        conserves_value(&plan);
    }

    #[test]
    fn reversed_order_descends() {
        let planner = Planner::default();
        let plan = planner
            .plan(
                &coins(&[1_000_000_000, 1_000_000_000]),
                &PlanRequest {
                    target_outputs: &[700_000_000],
                    fee: 21_000_000,
                    target_in_count: Some(2),
                    target_out_count: 3,
                    order: OutputOrder::Reversed,
                },
            )
            .expect("plan");
        let amounts: Vec<u64> = plan.outputs.iter().map(|o| o.amount).collect();
        let mut sorted = amounts.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(amounts, sorted);
    }

    #[test]
    fn chain_links_frames_through_change() {
        let planner = Planner::default();
        let frames = vec![
            FrameSpec {
                value: 700_000_000,
                fee: 21_000_000,
                in_count: Some(2),
                out_count: 2,
                order: OutputOrder::Canonical,
            },
            FrameSpec {
                value: 5_000_000,
                fee: 21_000_000,
                in_count: None,
                out_count: 2,
                order: OutputOrder::Canonical,
            },
        ];
        let plans = planner
            .plan_chain(&coins(&[900_000_000, 900_000_000]), &frames)
            .expect("chain");
        assert_eq!(plans.len(), 2);
        conserves_value(&plans[0]);
        conserves_value(&plans[1]);

        let change_idx = plans[0].change_index.expect("frame 1 change");
        let continuation = plans[0].outputs[change_idx].amount;
        assert_eq!(plans[1].inputs.len(), 1);
        assert_eq!(plans[1].inputs[0].amount, continuation);
        assert!(matches!(
            plans[1].inputs[0].funding,
            FundingRef::PreviousChange { frame: 0 }
        ));
    }

    #[test]
    fn chain_failure_reports_frame_index() {
        let planner = Planner::default();
        let frames = vec![
            FrameSpec {
                value: 700_000_000,
                fee: 21_000_000,
                in_count: Some(1),
                out_count: 2,
                order: OutputOrder::Canonical,
            },
            FrameSpec {
                value: 600_000_000,
                fee: 21_000_000,
                in_count: None,
                out_count: 2,
                order: OutputOrder::Canonical,
            },
        ];
        // Enough for frame 1 alone, not for the downstream frame.
        let err = planner
            .plan_chain(&coins(&[800_000_000]), &frames)
            .unwrap_err();
        assert_eq!(err.frame, 0);
        assert!(matches!(err.source, PlanError::InsufficientFunds { .. }));
    }

    #[test]
    fn chain_rejects_multi_input_later_frames() {
        let planner = Planner::default();
        let frames = vec![
            FrameSpec {
                value: 100_000,
                fee: 10_000,
                in_count: Some(1),
                out_count: 2,
                order: OutputOrder::Canonical,
            },
            FrameSpec {
                value: 100_000,
                fee: 10_000,
                in_count: Some(3),
                out_count: 1,
                order: OutputOrder::Canonical,
            },
        ];
        let err = planner
            .plan_chain(&coins(&[10_000_000]), &frames)
            .unwrap_err();
        assert_eq!(err.frame, 1);
        assert!(matches!(err.source, PlanError::InvalidFrameSpec(_)));
    }
}
