//! Packet grouping: partition an observation stream by gap threshold.
//!
//! Two observations spaced at most the threshold apart share a packet; one
//! unit beyond starts a new packet. The push-style [`PacketAssembler`] is the
//! primitive: poll-driven sources do not naturally signal "stream end", so an
//! idle packet is only emitted by the *next* observation or by an explicit
//! [`PacketAssembler::flush`]. Batch callers get the same semantics from
//! [`group_packets`].

use crate::observe::ObservedTx;

/// Gap threshold between consecutive observations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gap {
    Blocks(u64),
    Seconds(u64),
}

impl Gap {
    fn exceeded(&self, prev: &ObservedTx, next: &ObservedTx) -> bool {
        match *self {
            Gap::Blocks(max) => next.height.saturating_sub(prev.height) > max,
            Gap::Seconds(max) => next.timestamp.saturating_sub(prev.timestamp) > max,
        }
    }
}

/// A maximal run of observations within the gap threshold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub txs: Vec<ObservedTx>,
}

impl Packet {
    pub fn first_height(&self) -> Option<u64> {
        self.txs.first().map(|tx| tx.height)
    }
}

/// Push-style grouper for live feeds. Feed observations in stream order;
/// each push returns the packet it closed, if any. Call `flush` when the
/// caller decides the stream is idle or finished.
#[derive(Debug)]
pub struct PacketAssembler {
    gap: Gap,
    current: Vec<ObservedTx>,
}

impl PacketAssembler {
    pub fn new(gap: Gap) -> Self {
        PacketAssembler {
            gap,
            current: Vec::new(),
        }
    }

    pub fn push(&mut self, tx: ObservedTx) -> Option<Packet> {
        let closed = match self.current.last() {
            Some(prev) if self.gap.exceeded(prev, &tx) => Some(Packet {
                txs: std::mem::take(&mut self.current),
            }),
            _ => None,
        };
        self.current.push(tx);
        closed
    }

    /// Emit the in-progress packet, if any. The assembler stays usable.
    pub fn flush(&mut self) -> Option<Packet> {
        if self.current.is_empty() {
            None
        } else {
            Some(Packet {
                txs: std::mem::take(&mut self.current),
            })
        }
    }
}

/// Lazy packet sequence over an already-ordered observation producer. Ends
/// when the producer ends (the trailing packet is flushed then); restart by
/// re-subscribing to the source. Live feeds that never end should drive a
/// [`PacketAssembler`] directly and decide their own flush timing.
#[derive(Debug)]
pub struct Packets<I> {
    inner: I,
    assembler: PacketAssembler,
    done: bool,
}

impl<I: Iterator<Item = ObservedTx>> Iterator for Packets<I> {
    type Item = Packet;

    fn next(&mut self) -> Option<Packet> {
        if self.done {
            return None;
        }
        for tx in self.inner.by_ref() {
            if let Some(packet) = self.assembler.push(tx) {
                return Some(packet);
            }
        }
        self.done = true;
        self.assembler.flush()
    }
}

/// Adapt an ordered observation producer into a lazy packet sequence.
pub fn packets<I: IntoIterator<Item = ObservedTx>>(txs: I, gap: Gap) -> Packets<I::IntoIter> {
    Packets {
        inner: txs.into_iter(),
        assembler: PacketAssembler::new(gap),
        done: false,
    }
}

/// Group a finite observation sequence into packets. Input is sorted by
/// height then timestamp before grouping; observers deliver in roughly
/// confirmed order but replay sources may not.
pub fn group_packets(txs: impl IntoIterator<Item = ObservedTx>, gap: Gap) -> Vec<Packet> {
    let mut sorted: Vec<ObservedTx> = txs.into_iter().collect();
    sorted.sort_by_key(|tx| (tx.height, tx.timestamp));
    packets(sorted, gap).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx_at(height: u64) -> ObservedTx {
        ObservedTx {
            txid: format!("tx-{height}"),
            height,
            timestamp: height * 15,
            inputs: Vec::new(),
            outputs: Vec::new(),
            fee: 0,
            aux: None,
        }
    }

    #[test]
    fn spacing_at_threshold_shares_a_packet() {
        let packets = group_packets(vec![tx_at(100), tx_at(103)], Gap::Blocks(3));
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].txs.len(), 2);
    }

    #[test]
    fn spacing_one_beyond_threshold_splits() {
        let packets = group_packets(vec![tx_at(100), tx_at(104)], Gap::Blocks(3));
        assert_eq!(packets.len(), 2);
        assert_eq!(packets[0].txs.len(), 1);
        assert_eq!(packets[1].txs.len(), 1);
    }

    #[test]
    fn lone_observation_needs_a_flush() {
        let mut assembler = PacketAssembler::new(Gap::Blocks(3));
        assert!(assembler.push(tx_at(100)).is_none());
        let packet = assembler.flush().expect("flush emits the idle packet");
        assert_eq!(packet.txs.len(), 1);
        assert!(assembler.flush().is_none());
    }

    #[test]
    fn assembler_survives_reuse_after_flush() {
        let mut assembler = PacketAssembler::new(Gap::Seconds(120));
        assembler.push(tx_at(10));
        assembler.flush();
        assert!(assembler.push(tx_at(1000)).is_none());
        assert_eq!(assembler.flush().map(|p| p.txs.len()), Some(1));
    }

    #[test]
    fn lazy_sequence_ends_with_the_producer() {
        let mut seq = packets(vec![tx_at(10), tx_at(20), tx_at(21)], Gap::Blocks(3));
        assert_eq!(seq.next().map(|p| p.txs.len()), Some(1));
        assert_eq!(seq.next().map(|p| p.txs.len()), Some(2));
        assert_eq!(seq.next(), None);
        assert_eq!(seq.next(), None);
    }

    #[test]
    fn unsorted_replay_is_reordered() {
        let packets = group_packets(vec![tx_at(104), tx_at(100)], Gap::Blocks(3));
        assert_eq!(packets.len(), 2);
        assert_eq!(packets[0].first_height(), Some(100));
    }
}
