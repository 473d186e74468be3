//! Encoder: turn a dialect symbol into unsigned transaction skeletons.
//!
//! The encoder looks a symbol up in the dialect, derives planner inputs from
//! its predicates, and returns one [`Frame`] per planned transaction. It
//! never touches the ledger; signing and broadcast belong to the caller's
//! collaborators.

use crate::ast::{AuxRule, HeaderRole, SymbolBody};
use crate::client::{ClientError, CoinSource, HeightSource};
use crate::dialect::Dialect;
use crate::fees::FeePolicy;
use crate::observe::{encode_aux_payload, AuxError};
use crate::planner::{
    ChainPlanError, Coin, FrameSpec, Plan, PlanError, PlanRequest, PlannedInput, Planner,
};
use rand::Rng;
use tracing::debug;

/// One unsigned transaction realizing part of a symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub inputs: Vec<PlannedInput>,
    pub outputs: Vec<FrameOutput>,
    pub fee: u64,
    /// Block height the frame should land at, when the symbol declares a
    /// placement. Broadcast sequencing is the caller's concern.
    pub height_hint: Option<u64>,
    /// Index of the designated change output; in a chain it funds the next
    /// frame.
    pub change_index: Option<usize>,
    /// Auxiliary-plane payload, already framed for its carrier.
    pub aux: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameOutput {
    pub amount: u64,
    pub role: FrameRole,
}

/// Output role within a frame, as the dialect sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameRole {
    Anchor,
    Micro,
    Change,
}

#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("symbol {0} is not defined by the dialect")]
    UnknownSymbol(String),
    #[error("planning failed: {0}")]
    Plan(#[from] PlanError),
    #[error("{0}")]
    ChainPlan(#[from] ChainPlanError),
    #[error("symbol {symbol} requires an aux payload and none was supplied")]
    MissingAux { symbol: String },
    #[error("aux payload: {0}")]
    Aux(#[from] AuxError),
    #[error(transparent)]
    Client(#[from] ClientError),
}

/// Encodes symbols against one dialect.
pub struct Encoder<'a> {
    dialect: &'a Dialect,
    planner: Planner,
    policy: FeePolicy,
}

impl<'a> Encoder<'a> {
    pub fn new(dialect: &'a Dialect) -> Self {
        Encoder {
            dialect,
            planner: Planner::default(),
            policy: FeePolicy::new(),
        }
    }

    pub fn with_planner(mut self, planner: Planner) -> Self {
        self.planner = planner;
        self
    }

    pub fn with_policy(mut self, policy: FeePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Encode `symbol_name` into one frame per planned transaction.
    ///
    /// Each frame's fee is drawn from the symbol's declared band with bounded
    /// jitter so repeated uses of one symbol do not produce bit-identical
    /// transactions; the draw never lands below the fee policy floor. The RNG
    /// is caller-supplied so encoding stays reproducible under test.
    pub fn encode<R: Rng>(
        &self,
        symbol_name: &str,
        coins: &[Coin],
        current_height: u64,
        rng: &mut R,
    ) -> Result<Vec<Frame>, EncodeError> {
        self.encode_with_aux(symbol_name, coins, current_height, None, rng)
    }

    /// [`Encoder::encode`] with an auxiliary-plane payload. Required by
    /// symbols declaring `aux: required`; ignored by symbols declaring
    /// `aux: absent`.
    pub fn encode_with_aux<R: Rng>(
        &self,
        symbol_name: &str,
        coins: &[Coin],
        current_height: u64,
        aux: Option<&[u8]>,
        rng: &mut R,
    ) -> Result<Vec<Frame>, EncodeError> {
        let symbol = self
            .dialect
            .symbol(symbol_name)
            .ok_or_else(|| EncodeError::UnknownSymbol(symbol_name.to_string()))?;

        let first_pred = &symbol.frames()[0];
        let framed_aux = match (first_pred.aux, aux) {
            (AuxRule::Required, None) => {
                return Err(EncodeError::MissingAux {
                    symbol: symbol_name.to_string(),
                })
            }
            (AuxRule::Absent, _) => None,
            (_, Some(data)) => Some(encode_aux_payload(data)?),
            (_, None) => None,
        };

        let frames = match &symbol.body {
            SymbolBody::Single(pred) => {
                let fee = self.frame_fee(pred.fee, rng);
                let targets = [pred.value];
                let request = PlanRequest {
                    target_outputs: &targets,
                    fee,
                    target_in_count: pred.cardinality.map(|c| c.inputs),
                    target_out_count: pred.cardinality.map(|c| c.outputs).unwrap_or(1),
                    order: pred.order,
                };
                let plan = self.planner.plan(coins, &request)?;
                let height_hint = pred
                    .delta
                    .filter(|&d| d > 0)
                    .map(|d| current_height + d);
                vec![self.frame_from_plan(plan, pred.value, height_hint, framed_aux.clone())]
            }
            SymbolBody::Chain(preds) => {
                let specs: Vec<FrameSpec> = preds
                    .iter()
                    .map(|pred| FrameSpec {
                        value: pred.value,
                        fee: self.frame_fee(pred.fee, rng),
                        in_count: pred.cardinality.map(|c| c.inputs),
                        out_count: pred.cardinality.map(|c| c.outputs).unwrap_or(2),
                        order: pred.order,
                    })
                    .collect();
                let plans = self.planner.plan_chain(coins, &specs)?;
                let mut running = current_height;
                let mut frames = Vec::with_capacity(plans.len());
                for (pred, plan) in preds.iter().zip(plans) {
                    let delta = pred.delta.unwrap_or_else(|| self.dialect.block_cadence());
                    running += delta;
                    let hint = (delta > 0).then_some(running);
                    let aux = if frames.is_empty() {
                        framed_aux.clone()
                    } else {
                        None
                    };
                    frames.push(self.frame_from_plan(plan, pred.value, hint, aux));
                }
                frames
            }
        };

        debug!(
            symbol = symbol_name,
            frames = frames.len(),
            "encoded symbol"
        );
        Ok(frames)
    }

    /// Encode by querying injected collaborators for coins and height.
    pub fn encode_from_sources<C, H, R>(
        &self,
        symbol_name: &str,
        coin_source: &C,
        heights: &H,
        min_confirmations: u32,
        rng: &mut R,
    ) -> Result<Vec<Frame>, EncodeError>
    where
        C: CoinSource,
        H: HeightSource,
        R: Rng,
    {
        let coins = coin_source.list_spendable(min_confirmations)?;
        let height = heights.current_height()?;
        self.encode(symbol_name, &coins, height, rng)
    }

    /// Frames without a declared band pay the policy floor.
    fn frame_fee<R: Rng>(&self, band_center: Option<u64>, rng: &mut R) -> u64 {
        match band_center.and_then(|center| self.dialect.fee_band(center)) {
            Some(band) => self.policy.draw_from_band(band, rng).fee,
            None => self.policy.floor(),
        }
    }

    fn frame_from_plan(
        &self,
        plan: Plan,
        header_value: u64,
        height_hint: Option<u64>,
        aux: Option<Vec<u8>>,
    ) -> Frame {
        let header_role = match self.dialect.header(header_value).map(|h| h.role) {
            Some(HeaderRole::Micro) => FrameRole::Micro,
            _ => FrameRole::Anchor,
        };
        let outputs = plan
            .outputs
            .iter()
            .map(|o| FrameOutput {
                amount: o.amount,
                role: match o.role {
                    crate::planner::PlanRole::Target => header_role,
                    crate::planner::PlanRole::Change => FrameRole::Change,
                },
            })
            .collect();
        Frame {
            inputs: plan.inputs,
            outputs,
            fee: plan.fee,
            height_hint,
            change_index: plan.change_index,
            aux,
        }
    }
}
