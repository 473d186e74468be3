//! # chainsig — state-vector signaling over UTXO transaction mechanics
//!
//! Ordinary ledger transactions carry more dimensions than the amounts they
//! move: fee, input/output counts, spend timing, output ordering, and
//! optional auxiliary data. chainsig treats each transaction as a **state
//! vector** across those planes and maps named **symbols** onto vector
//! constraints through a **dialect** document. The encoder realizes a symbol
//! as fully valid unsigned transactions; the decoder watches observed traffic
//! and reconstructs the symbol stream.
//!
//! ## Dialect documents
//!
//! ```text
//! dialect ops-v1 {
//! 	version: 1;
//!
//! 	planes {
//! 		value {
//! 			header 700000000 anchor;
//! 		}
//! 		fee {
//! 			band 21000000 tolerance 500000;
//! 		}
//! 		cardinality {
//! 			rule 3:3;
//! 		}
//! 		block {
//! 			cadence 3 jitter 1;
//! 		}
//! 	}
//!
//! 	symbol HEARTBEAT {
//! 		value: 700000000;
//! 		fee: 21000000;
//! 		cardinality: 3:3;
//! 		delta: 3;
//! 	}
//! }
//! ```
//!
//! Documents are validated at load time: malformed structure, undeclared
//! headers or bands, and (by default) overlapping symbol predicates all
//! reject the dialect before anything is encoded or decoded.
//!
//! ## Pipeline
//!
//! - **Encode**: [`Encoder`] looks the symbol up, draws a fee inside the
//!   declared band, and asks the [`planner`] to realize the output pattern
//!   from available coins. Multi-frame symbols plan as a chain whose change
//!   outputs thread the frames together.
//! - **Observe**: the caller's collaborators (see [`client`]) poll the ledger
//!   and deliver [`ObservedTx`] values; the [`packet`] grouper partitions
//!   them by gap threshold.
//! - **Decode**: [`Decoder`] projects each transaction onto a [`StateVector`]
//!   and matches packets against the dialect, reporting `NoMatch`,
//!   `Ambiguous`, and `PartialChain` as data rather than failures.
//!
//! Signing, broadcast, key management, and RPC transport are collaborator
//! concerns, injected via the traits in [`client`].

pub mod alphabet;
pub mod ast;
pub mod client;
pub mod decoder;
pub mod dialect;
pub mod encoder;
pub mod fees;
pub mod lint;
pub mod observe;
pub mod packet;
pub mod parser;
pub mod planner;
pub mod vector;

pub use ast::{AuxRule, CardinalityRule, FeeBand, HeaderRole, OutputOrder, Resolution};
pub use decoder::{Decoded, DecodedSymbol, Decoder, PacketDecode};
pub use dialect::{Dialect, DialectError, MatchOutcome};
pub use encoder::{EncodeError, Encoder, Frame, FrameOutput, FrameRole};
pub use fees::{FeePolicy, FeeSelection};
pub use observe::{ObservedTx, OutPoint, TxOut};
pub use packet::{group_packets, packets, Gap, Packet, PacketAssembler, Packets};
pub use parser::parse;
pub use planner::{
    ChainPlanError, Coin, FrameSpec, FundingRef, Plan, PlanError, PlanRequest, Planner,
};
pub use vector::{Projector, StateVector, Symmetry, MINOR_UNITS_PER_COIN};
