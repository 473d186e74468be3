//! Dialect document diagnostics.
//!
//! ## Rules
//!
//! - **Structural**: fee band references, cardinality bounds, chain length,
//!   and header references must hold (error severity; the loader refuses the
//!   document).
//! - **PredicateOverlap**: two single-frame symbols whose predicates can both
//!   match one state vector. Error under `reject-overlap` resolution (the
//!   default), warning under `declaration-order`.
//! - **Advisory**: dust-unsafe headers and zero-tolerance bands decode fine
//!   but are fragile to author; they surface as warnings.
//!
//! Findings carry the symbol they concern where one applies, so loader errors
//! can point at the offending declaration.

use crate::ast::*;

/// Severity of a dialect finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// Identifies which rule produced the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckRule {
    /// Two symbol predicates can match the same state vector.
    PredicateOverlap,
    /// A predicate references a fee band the fee plane does not declare.
    UndeclaredBand,
    /// A predicate's value is not a declared header.
    UndeclaredHeader,
    /// A predicate's cardinality is not a declared rule.
    UndeclaredCardinality,
    /// Cardinality rules need `m, n >= 1`.
    DegenerateCardinality,
    /// Chains need at least two frames.
    ChainTooShort,
    /// A declared header sits below the conventional dust floor.
    DustUnsafeHeader,
    /// A fee band with zero tolerance makes every realization bit-identical.
    ZeroToleranceBand,
    /// The document declares no symbols.
    NoSymbols,
    /// Two symbols share a name.
    DuplicateSymbol,
}

/// A single finding.
#[derive(Debug, Clone)]
pub struct CheckMessage {
    pub rule: CheckRule,
    pub severity: Severity,
    /// Symbol the finding concerns, when one applies.
    pub symbol: Option<String>,
    pub message: String,
}

/// Conventional dust floor used for advisory header checks, minor units.
const ADVISORY_DUST_FLOOR: u64 = 10_000;

/// Run all checks on a parsed document. Returns findings in rule order;
/// error-severity findings make the document unloadable.
pub fn check(doc: &DialectDoc) -> Vec<CheckMessage> {
    let mut out = Vec::new();

    if doc.symbols.is_empty() {
        out.push(CheckMessage {
            rule: CheckRule::NoSymbols,
            severity: Severity::Error,
            symbol: None,
            message: "dialect declares no symbols".to_string(),
        });
    }

    for (i, symbol) in doc.symbols.iter().enumerate() {
        if doc.symbols[..i].iter().any(|s| s.name == symbol.name) {
            out.push(CheckMessage {
                rule: CheckRule::DuplicateSymbol,
                severity: Severity::Error,
                symbol: Some(symbol.name.clone()),
                message: format!("symbol {} is declared twice", symbol.name),
            });
        }
        if symbol.is_chain() && symbol.frame_count() < 2 {
            out.push(CheckMessage {
                rule: CheckRule::ChainTooShort,
                severity: Severity::Error,
                symbol: Some(symbol.name.clone()),
                message: format!("chain symbol {} needs at least two frames", symbol.name),
            });
        }
        for (frame_idx, frame) in symbol.frames().iter().enumerate() {
            check_frame(doc, symbol, frame_idx, frame, &mut out);
        }
    }

    check_plane_advisories(doc, &mut out);
    check_overlaps(doc, &mut out);
    out
}

fn check_frame(
    doc: &DialectDoc,
    symbol: &SymbolSection,
    frame_idx: usize,
    frame: &FramePredicate,
    out: &mut Vec<CheckMessage>,
) {
    let at = if symbol.is_chain() {
        format!("{} frame #{}", symbol.name, frame_idx + 1)
    } else {
        symbol.name.clone()
    };

    if !doc.planes.value.iter().any(|h| h.amount == frame.value) {
        out.push(CheckMessage {
            rule: CheckRule::UndeclaredHeader,
            severity: Severity::Error,
            symbol: Some(symbol.name.clone()),
            message: format!(
                "{at}: value {} is not a declared header",
                frame.value
            ),
        });
    }
    if let Some(center) = frame.fee {
        if !doc.planes.fee.iter().any(|b| b.center == center) {
            out.push(CheckMessage {
                rule: CheckRule::UndeclaredBand,
                severity: Severity::Error,
                symbol: Some(symbol.name.clone()),
                message: format!("{at}: fee {center} is not a declared band center"),
            });
        }
    }
    if let Some(rule) = frame.cardinality {
        if rule.inputs == 0 || rule.outputs == 0 {
            out.push(CheckMessage {
                rule: CheckRule::DegenerateCardinality,
                severity: Severity::Error,
                symbol: Some(symbol.name.clone()),
                message: format!(
                    "{at}: cardinality {}:{} needs m, n >= 1",
                    rule.inputs, rule.outputs
                ),
            });
        } else if !doc.planes.cardinality.rules.contains(&rule) {
            out.push(CheckMessage {
                rule: CheckRule::UndeclaredCardinality,
                severity: Severity::Error,
                symbol: Some(symbol.name.clone()),
                message: format!(
                    "{at}: cardinality {}:{} is not a declared rule",
                    rule.inputs, rule.outputs
                ),
            });
        }
    }
}

fn check_plane_advisories(doc: &DialectDoc, out: &mut Vec<CheckMessage>) {
    for rule in &doc.planes.cardinality.rules {
        if rule.inputs == 0 || rule.outputs == 0 {
            out.push(CheckMessage {
                rule: CheckRule::DegenerateCardinality,
                severity: Severity::Error,
                symbol: None,
                message: format!(
                    "cardinality rule {}:{} needs m, n >= 1",
                    rule.inputs, rule.outputs
                ),
            });
        }
    }
    for header in &doc.planes.value {
        if header.amount < ADVISORY_DUST_FLOOR {
            out.push(CheckMessage {
                rule: CheckRule::DustUnsafeHeader,
                severity: Severity::Warning,
                symbol: None,
                message: format!(
                    "header {} sits below the conventional dust floor ({})",
                    header.amount, ADVISORY_DUST_FLOOR
                ),
            });
        }
    }
    for band in &doc.planes.fee {
        if band.tolerance == 0 {
            out.push(CheckMessage {
                rule: CheckRule::ZeroToleranceBand,
                severity: Severity::Warning,
                symbol: None,
                message: format!(
                    "fee band {} has zero tolerance; repeated uses are bit-identical",
                    band.center
                ),
            });
        }
    }
}

/// Pairwise overlap over single-frame symbols: two predicates overlap when a
/// single state vector can satisfy both. Chains are matched positionally by
/// the decoder and are excluded from the static check.
fn check_overlaps(doc: &DialectDoc, out: &mut Vec<CheckMessage>) {
    let severity = match doc.resolution {
        Resolution::RejectOverlap => Severity::Error,
        Resolution::DeclarationOrder => Severity::Warning,
    };
    let singles: Vec<(&str, &FramePredicate)> = doc
        .symbols
        .iter()
        .filter_map(|s| match &s.body {
            SymbolBody::Single(p) => Some((s.name.as_str(), p)),
            SymbolBody::Chain(_) => None,
        })
        .collect();

    for (i, (name_a, pred_a)) in singles.iter().enumerate() {
        for (name_b, pred_b) in &singles[i + 1..] {
            if predicates_overlap(doc, pred_a, pred_b) {
                out.push(CheckMessage {
                    rule: CheckRule::PredicateOverlap,
                    severity,
                    symbol: Some(name_a.to_string()),
                    message: format!(
                        "symbols {name_a} and {name_b} can match the same state vector"
                    ),
                });
            }
        }
    }
}

/// A plane left unconstrained by either predicate intersects trivially; a
/// plane both constrain intersects only if the constraints can hold at once.
fn predicates_overlap(doc: &DialectDoc, a: &FramePredicate, b: &FramePredicate) -> bool {
    if a.value != b.value {
        return false;
    }
    if let (Some(fa), Some(fb)) = (a.fee, b.fee) {
        let band_a = band_for(doc, fa);
        let band_b = band_for(doc, fb);
        if let (Some(band_a), Some(band_b)) = (band_a, band_b) {
            if !band_a.intersects(&band_b) {
                return false;
            }
        }
    }
    if let (Some(ca), Some(cb)) = (a.cardinality, b.cardinality) {
        if ca != cb {
            return false;
        }
    }
    if let (Some(da), Some(db)) = (a.delta, b.delta) {
        // Both deltas admit +/- jitter, so disjointness needs twice the gap.
        if da.abs_diff(db) > 2 * doc.planes.block.jitter {
            return false;
        }
    }
    if let (Some(sa), Some(sb)) = (a.symmetry, b.symmetry) {
        if sa != sb {
            return false;
        }
    }
    !matches!(
        (a.aux, b.aux),
        (AuxRule::Absent, AuxRule::Required) | (AuxRule::Required, AuxRule::Absent)
    )
}

fn band_for(doc: &DialectDoc, center: u64) -> Option<FeeBand> {
    doc.planes.fee.iter().copied().find(|b| b.center == center)
}
