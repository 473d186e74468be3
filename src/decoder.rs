//! Decoder: reconstruct symbol streams from observed packets.
//!
//! Single-frame symbols match independently per transaction. Chain symbols
//! are driven positionally: a matcher per candidate chain advances when a
//! transaction satisfies the next frame predicate within tolerance and, for
//! linked chains, spends the previous frame's designated change output. A
//! matcher whose timing breaks beyond the dialect's jitter is abandoned, not
//! force-fit.
//!
//! `NoMatch`, `Ambiguous`, and `PartialChain` are data results, never
//! errors: a long observation stream keeps decoding past them.

use crate::ast::SymbolSection;
use crate::dialect::{Dialect, MatchOutcome};
use crate::observe::{ObservedTx, OutPoint};
use crate::packet::{group_packets, Gap, Packet};
use crate::vector::StateVector;
use tracing::{debug, trace};

/// One recovered symbol occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedSymbol {
    pub symbol: String,
    /// Number of transactions that realized it.
    pub frames: usize,
    pub first_height: u64,
    /// Auxiliary payload of the first matched transaction, when present.
    pub aux: Option<Vec<u8>>,
}

/// Outcome of decoding one packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// Symbols recovered, in stream order.
    Message(Vec<DecodedSymbol>),
    /// Two or more symbols claim the same transaction; surfaced, never
    /// silently resolved.
    Ambiguous { candidates: Vec<String> },
    NoMatch,
    /// A chain matcher died mid-sequence; the matched prefix has operational
    /// value and is reported.
    PartialChain {
        symbol: String,
        matched: usize,
        expected: usize,
    },
}

/// A packet paired with what it decoded to.
#[derive(Debug, Clone)]
pub struct PacketDecode {
    pub packet: Packet,
    pub outcome: Decoded,
}

/// In-progress chain match.
struct ChainMatcher<'a> {
    symbol: &'a SymbolSection,
    /// Next expected frame index.
    next: usize,
    first_height: u64,
    first_aux: Option<Vec<u8>>,
    last_height: u64,
    /// Previous frame's candidate designated-change outpoints.
    link_outpoints: Vec<OutPoint>,
    consumed: Vec<usize>,
}

enum Advance {
    Matched,
    Abandoned,
    NotOurs,
}

/// Decodes packets against one dialect.
pub struct Decoder<'a> {
    dialect: &'a Dialect,
}

impl<'a> Decoder<'a> {
    pub fn new(dialect: &'a Dialect) -> Self {
        Decoder { dialect }
    }

    /// Decode a whole observation stream: group into packets, decode each,
    /// and keep going whatever each packet yields.
    pub fn decode_stream(
        &self,
        txs: impl IntoIterator<Item = ObservedTx>,
        gap: Gap,
    ) -> Vec<PacketDecode> {
        group_packets(txs, gap)
            .into_iter()
            .map(|packet| {
                let outcome = self.decode_packet(&packet);
                debug!(
                    txs = packet.txs.len(),
                    first_height = packet.first_height(),
                    ?outcome,
                    "decoded packet"
                );
                PacketDecode { packet, outcome }
            })
            .collect()
    }

    /// Decode one packet.
    pub fn decode_packet(&self, packet: &Packet) -> Decoded {
        let projector = self.dialect.projector();
        let mut prior_height = None;
        let mut vectors = Vec::with_capacity(packet.txs.len());
        for tx in &packet.txs {
            vectors.push(projector.project(tx, prior_height));
            prior_height = Some(tx.height);
        }

        let mut active: Vec<ChainMatcher<'_>> = Vec::new();
        let mut completed: Vec<(usize, DecodedSymbol, Vec<usize>)> = Vec::new();
        let mut partials: Vec<(String, usize, usize)> = Vec::new();
        let mut single_hits: Vec<(usize, DecodedSymbol)> = Vec::new();
        let mut ambiguous: Vec<String> = Vec::new();

        for (i, (tx, vector)) in packet.txs.iter().zip(&vectors).enumerate() {
            self.step_matchers(
                i,
                tx,
                vector,
                &mut active,
                &mut completed,
                &mut partials,
            );
            self.seed_matchers(i, tx, vector, &mut active);

            match self.dialect.match_vector(vector) {
                MatchOutcome::Symbol(symbol) => single_hits.push((
                    i,
                    DecodedSymbol {
                        symbol: symbol.name.clone(),
                        frames: 1,
                        first_height: tx.height,
                        aux: tx.aux.clone(),
                    },
                )),
                MatchOutcome::Ambiguous(symbols) => {
                    for symbol in symbols {
                        if !ambiguous.contains(&symbol.name) {
                            ambiguous.push(symbol.name.clone());
                        }
                    }
                }
                MatchOutcome::NoMatch => {}
            }
        }

        // Matchers still waiting at packet end were cut off by the gap.
        for matcher in active {
            partials.push((
                matcher.symbol.name.clone(),
                matcher.next,
                matcher.symbol.frame_count(),
            ));
        }

        if !ambiguous.is_empty() {
            return Decoded::Ambiguous {
                candidates: ambiguous,
            };
        }

        // Chain matches are the more specific parse: transactions a completed
        // chain consumed do not double as single-frame symbols.
        let consumed: Vec<usize> = completed
            .iter()
            .flat_map(|(_, _, txs)| txs.iter().copied())
            .collect();
        let mut symbols: Vec<(usize, DecodedSymbol)> = completed
            .into_iter()
            .map(|(first_idx, symbol, _)| (first_idx, symbol))
            .collect();
        symbols.extend(
            single_hits
                .into_iter()
                .filter(|(i, _)| !consumed.contains(i)),
        );
        symbols.sort_by_key(|(i, _)| *i);

        if !symbols.is_empty() {
            return Decoded::Message(symbols.into_iter().map(|(_, s)| s).collect());
        }
        if let Some((symbol, matched, expected)) =
            partials.into_iter().max_by_key(|(_, matched, _)| *matched)
        {
            return Decoded::PartialChain {
                symbol,
                matched,
                expected,
            };
        }
        Decoded::NoMatch
    }

    fn step_matchers(
        &self,
        index: usize,
        tx: &ObservedTx,
        vector: &StateVector,
        active: &mut Vec<ChainMatcher<'a>>,
        completed: &mut Vec<(usize, DecodedSymbol, Vec<usize>)>,
        partials: &mut Vec<(String, usize, usize)>,
    ) {
        let mut i = 0;
        while i < active.len() {
            match self.try_advance(&mut active[i], index, tx, vector) {
                Advance::Matched => {
                    if active[i].next == active[i].symbol.frame_count() {
                        let matcher = active.remove(i);
                        let first_idx = matcher.consumed[0];
                        trace!(symbol = %matcher.symbol.name, "chain completed");
                        completed.push((
                            first_idx,
                            DecodedSymbol {
                                symbol: matcher.symbol.name.clone(),
                                frames: matcher.consumed.len(),
                                first_height: matcher.first_height,
                                aux: matcher.first_aux,
                            },
                            matcher.consumed,
                        ));
                        continue;
                    }
                    i += 1;
                }
                Advance::Abandoned => {
                    let matcher = active.remove(i);
                    trace!(symbol = %matcher.symbol.name, at = matcher.next, "chain abandoned");
                    partials.push((
                        matcher.symbol.name.clone(),
                        matcher.next,
                        matcher.symbol.frame_count(),
                    ));
                }
                Advance::NotOurs => i += 1,
            }
        }
    }

    fn try_advance(
        &self,
        matcher: &mut ChainMatcher<'a>,
        index: usize,
        tx: &ObservedTx,
        vector: &StateVector,
    ) -> Advance {
        let pred = &matcher.symbol.frames()[matcher.next];
        let chain_delta = tx.height.saturating_sub(matcher.last_height);
        let linkage_hit = matcher
            .link_outpoints
            .iter()
            .any(|outpoint| tx.spends(outpoint));
        if matcher.symbol.linked && !linkage_hit {
            return Advance::NotOurs;
        }

        // Evaluate against the chain-relative delta, not the packet-relative
        // one the projector produced.
        let mut chain_vector = vector.clone();
        chain_vector.block_delta = Some(chain_delta as i64);

        let mut timeless = pred.clone();
        timeless.delta = None;
        let shape_ok = self.dialect.frame_matches(&timeless, &chain_vector);
        if !shape_ok {
            // For a linked chain the continuation was spent by a
            // non-conforming transaction; the chain cannot resume.
            return if matcher.symbol.linked {
                Advance::Abandoned
            } else {
                Advance::NotOurs
            };
        }
        if !self.dialect.frame_matches(pred, &chain_vector) {
            return Advance::Abandoned;
        }

        matcher.next += 1;
        matcher.last_height = tx.height;
        matcher.link_outpoints = non_primary_outpoints(tx, pred.value);
        matcher.consumed.push(index);
        Advance::Matched
    }

    fn seed_matchers(
        &self,
        index: usize,
        tx: &ObservedTx,
        vector: &StateVector,
        active: &mut Vec<ChainMatcher<'a>>,
    ) {
        for symbol in self.dialect.symbols() {
            if !symbol.is_chain() {
                continue;
            }
            // One in-flight matcher per chain symbol: a packet replays one
            // chain at a time for a given symbol.
            if active.iter().any(|m| std::ptr::eq(m.symbol, symbol)) {
                continue;
            }
            let first = &symbol.frames()[0];
            let mut opening = first.clone();
            opening.delta = None;
            if self.dialect.frame_matches(&opening, vector) {
                active.push(ChainMatcher {
                    symbol,
                    next: 1,
                    first_height: tx.height,
                    first_aux: tx.aux.clone(),
                    last_height: tx.height,
                    link_outpoints: non_primary_outpoints(tx, first.value),
                    consumed: vec![index],
                });
            }
        }
    }
}

/// Every output other than the frame's value header is a candidate
/// designated-change output from the observer's viewpoint.
fn non_primary_outpoints(tx: &ObservedTx, header_value: u64) -> Vec<OutPoint> {
    let mut primary_claimed = false;
    tx.outputs
        .iter()
        .enumerate()
        .filter_map(|(vout, output)| {
            if output.amount == header_value && !primary_claimed {
                primary_claimed = true;
                None
            } else {
                Some(OutPoint::new(tx.txid.clone(), vout as u32))
            }
        })
        .collect()
}
