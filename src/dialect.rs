//! Resolved dialect model: load, validate, index, and match.
//!
//! Dialects are loaded once, validated eagerly (fail fast, never at decode
//! time), and treated as immutable afterwards; a `Dialect` can be shared
//! read-only across concurrent encode/decode sessions.

use crate::ast::*;
use crate::lint::{self, CheckMessage, Severity};
use crate::vector::{Projector, StateVector};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum DialectError {
    #[error("{0}")]
    Parse(String),
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
    #[error("dialect {name} failed validation: {summary}")]
    Invalid {
        name: String,
        summary: String,
        findings: Vec<CheckMessage>,
    },
}

/// Outcome of matching one state vector against the single-frame symbol table.
#[derive(Debug, Clone)]
pub enum MatchOutcome<'a> {
    Symbol(&'a SymbolSection),
    /// Two or more predicates matched and the dialect did not opt in to
    /// declaration-order resolution. Candidates in declaration order.
    Ambiguous(Vec<&'a SymbolSection>),
    NoMatch,
}

/// A validated, indexed dialect.
#[derive(Debug, Clone)]
pub struct Dialect {
    doc: DialectDoc,
    symbols_by_name: HashMap<String, usize>,
    warnings: Vec<CheckMessage>,
}

impl Dialect {
    /// Load a dialect from document source. Structural problems and (by
    /// default) predicate overlap reject the document here, never at decode
    /// time.
    pub fn load_str(source: &str) -> Result<Self, DialectError> {
        let doc = crate::parser::parse(source).map_err(DialectError::Parse)?;
        Self::resolve(doc)
    }

    /// Load a dialect definition from a file path.
    pub fn load_file(path: impl AsRef<Path>) -> Result<Self, DialectError> {
        let source = std::fs::read_to_string(path)?;
        Self::load_str(&source)
    }

    fn resolve(doc: DialectDoc) -> Result<Self, DialectError> {
        let findings = lint::check(&doc);
        let (errors, warnings): (Vec<_>, Vec<_>) = findings
            .into_iter()
            .partition(|m| m.severity == Severity::Error);
        if !errors.is_empty() {
            let summary = errors
                .iter()
                .map(|m| m.message.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(DialectError::Invalid {
                name: doc.name,
                summary,
                findings: errors,
            });
        }

        let mut symbols_by_name = HashMap::new();
        for (i, symbol) in doc.symbols.iter().enumerate() {
            symbols_by_name.insert(symbol.name.clone(), i);
        }
        debug!(
            dialect = %doc.name,
            symbols = doc.symbols.len(),
            warnings = warnings.len(),
            "loaded dialect"
        );
        Ok(Dialect {
            doc,
            symbols_by_name,
            warnings,
        })
    }

    pub fn name(&self) -> &str {
        &self.doc.name
    }

    pub fn version(&self) -> u64 {
        self.doc.version
    }

    pub fn resolution(&self) -> Resolution {
        self.doc.resolution
    }

    /// Advisory findings from load time.
    pub fn warnings(&self) -> &[CheckMessage] {
        &self.warnings
    }

    pub fn symbols(&self) -> impl Iterator<Item = &SymbolSection> {
        self.doc.symbols.iter()
    }

    pub fn symbol(&self, name: &str) -> Option<&SymbolSection> {
        self.symbols_by_name
            .get(name)
            .map(|&i| &self.doc.symbols[i])
    }

    pub fn header(&self, amount: u64) -> Option<&ValueHeader> {
        self.doc.planes.value.iter().find(|h| h.amount == amount)
    }

    pub fn fee_band(&self, center: u64) -> Option<&FeeBand> {
        self.doc.planes.fee.iter().find(|b| b.center == center)
    }

    pub fn block_jitter(&self) -> u64 {
        self.doc.planes.block.jitter
    }

    pub fn block_cadence(&self) -> u64 {
        self.doc.planes.block.cadence
    }

    /// Projector configured with this dialect's symmetry threshold.
    pub fn projector(&self) -> Projector {
        Projector::new(self.doc.planes.cardinality.symmetry_threshold)
    }

    /// Evaluate one frame predicate against a state vector.
    ///
    /// A `delta` constraint is vacuously satisfied when the vector carries the
    /// first-frame sentinel: there is no reference point to measure against.
    pub fn frame_matches(&self, pred: &FramePredicate, vector: &StateVector) -> bool {
        if vector.value != pred.value {
            return false;
        }
        if let Some(center) = pred.fee {
            // Validated at load: the band exists.
            match self.fee_band(center) {
                Some(band) if band.contains(vector.fee) => {}
                _ => return false,
            }
        }
        if let Some(rule) = pred.cardinality {
            if vector.in_count != rule.inputs || vector.out_count != rule.outputs {
                return false;
            }
        }
        if let Some(delta) = pred.delta {
            if let Some(observed) = vector.block_delta {
                if observed < 0 {
                    return false;
                }
                if (observed as u64).abs_diff(delta) > self.block_jitter() {
                    return false;
                }
            }
        }
        if let Some(symmetry) = pred.symmetry {
            if vector.symmetry != symmetry {
                return false;
            }
        }
        match pred.aux {
            AuxRule::Any => true,
            AuxRule::Absent => vector.aux.is_none(),
            AuxRule::Required => vector.aux.is_some(),
        }
    }

    /// Match a state vector against the single-frame symbol table.
    ///
    /// Predicates are evaluated in declaration order. Under
    /// `declaration-order` resolution the first satisfying symbol wins; under
    /// the default, a multi-way match surfaces as [`MatchOutcome::Ambiguous`]
    /// rather than being resolved silently. Chains never match here; the
    /// decoder drives those positionally.
    pub fn match_vector(&self, vector: &StateVector) -> MatchOutcome<'_> {
        let mut hits: Vec<&SymbolSection> = Vec::new();
        for symbol in &self.doc.symbols {
            let SymbolBody::Single(pred) = &symbol.body else {
                continue;
            };
            if self.frame_matches(pred, vector) {
                if self.doc.resolution == Resolution::DeclarationOrder {
                    return MatchOutcome::Symbol(symbol);
                }
                hits.push(symbol);
            }
        }
        match hits.len() {
            0 => MatchOutcome::NoMatch,
            1 => MatchOutcome::Symbol(hits[0]),
            _ => MatchOutcome::Ambiguous(hits),
        }
    }
}
