//! Abstract syntax tree for dialect definition documents.
//!
//! Every plane rule and symbol predicate is a closed variant set, so predicate
//! evaluation is exhaustive and overlap detection is an enumerable check.

use crate::vector::Symmetry;

/// Raw dialect document: planes, symbols, resolution policy.
#[derive(Debug, Clone)]
pub struct DialectDoc {
    pub name: String,
    pub version: u64,
    pub resolution: Resolution,
    pub planes: PlanesSection,
    pub symbols: Vec<SymbolSection>,
}

/// How the dialect wants overlapping predicates handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Overlap between two symbol predicates fails validation (default).
    RejectOverlap,
    /// Declaration order is the documented tie-break; first match wins.
    DeclarationOrder,
}

#[derive(Debug, Clone)]
pub struct PlanesSection {
    pub value: Vec<ValueHeader>,
    pub fee: Vec<FeeBand>,
    pub cardinality: CardinalityPlane,
    pub block: BlockPlane,
}

/// A recognized amount header with its structural role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueHeader {
    pub amount: u64,
    pub role: HeaderRole,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderRole {
    /// Structurally significant, whole-unit scale.
    Anchor,
    /// Sub-unit modifier.
    Micro,
}

/// Fee band: center plus symmetric tolerance, minor units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeBand {
    pub center: u64,
    pub tolerance: u64,
}

impl FeeBand {
    pub fn contains(&self, fee: u64) -> bool {
        fee.abs_diff(self.center) <= self.tolerance
    }

    pub fn intersects(&self, other: &FeeBand) -> bool {
        self.center.abs_diff(other.center) <= self.tolerance + other.tolerance
    }
}

#[derive(Debug, Clone)]
pub struct CardinalityPlane {
    pub rules: Vec<CardinalityRule>,
    /// Count difference beyond which a transaction is asymmetric.
    pub symmetry_threshold: u32,
}

/// m inputs, n outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CardinalityRule {
    pub inputs: u32,
    pub outputs: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct BlockPlane {
    /// Declared block-interval cadence between frames.
    pub cadence: u64,
    /// Accepted deviation from a declared delta when matching.
    pub jitter: u64,
}

/// One named symbol: a single frame predicate or an ordered chain of them.
#[derive(Debug, Clone)]
pub struct SymbolSection {
    pub name: String,
    /// Chain frames must spend the previous frame's designated change output.
    pub linked: bool,
    pub body: SymbolBody,
}

#[derive(Debug, Clone)]
pub enum SymbolBody {
    Single(FramePredicate),
    Chain(Vec<FramePredicate>),
}

impl SymbolSection {
    pub fn frame_count(&self) -> usize {
        match &self.body {
            SymbolBody::Single(_) => 1,
            SymbolBody::Chain(frames) => frames.len(),
        }
    }

    pub fn frames(&self) -> &[FramePredicate] {
        match &self.body {
            SymbolBody::Single(frame) => std::slice::from_ref(frame),
            SymbolBody::Chain(frames) => frames,
        }
    }

    pub fn is_chain(&self) -> bool {
        matches!(self.body, SymbolBody::Chain(_))
    }
}

/// Constraint over one frame's state vector. `value` is mandatory; the other
/// planes are constrained only when declared.
#[derive(Debug, Clone)]
pub struct FramePredicate {
    pub value: u64,
    /// References a declared fee band by center.
    pub fee: Option<u64>,
    pub cardinality: Option<CardinalityRule>,
    /// Expected height offset from the previous frame.
    pub delta: Option<u64>,
    pub symmetry: Option<Symmetry>,
    pub order: OutputOrder,
    pub aux: AuxRule,
}

impl FramePredicate {
    pub fn new(value: u64) -> Self {
        FramePredicate {
            value,
            fee: None,
            cardinality: None,
            delta: None,
            symmetry: None,
            order: OutputOrder::Canonical,
            aux: AuxRule::Any,
        }
    }
}

/// Requested output ordering for realized transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputOrder {
    /// Amount ascending, change last among equal amounts.
    #[default]
    Canonical,
    /// Deliberately non-canonical; used to signal exceptional states.
    Reversed,
}

/// Auxiliary-plane constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuxRule {
    #[default]
    Any,
    Absent,
    Required,
}
