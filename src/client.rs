//! External-collaborator contracts.
//!
//! The core never talks to a node directly. Coin listing, height queries,
//! observation feeds, signing, and broadcast are injected through these
//! traits, so sessions stay testable against fakes and safely callable
//! concurrently. Reservation/locking of coins between concurrent plans is a
//! collaborator responsibility as well.

use crate::encoder::Frame;
use crate::observe::ObservedTx;
use crate::planner::Coin;

/// Collaborator failure, opaque to the core.
#[derive(Debug, thiserror::Error)]
#[error("client: {0}")]
pub struct ClientError(pub String);

/// Supplies spendable coins.
pub trait CoinSource {
    fn list_spendable(&self, min_confirmations: u32) -> Result<Vec<Coin>, ClientError>;
}

/// Supplies the current chain height.
pub trait HeightSource {
    fn current_height(&self) -> Result<u64, ClientError>;
}

/// Supplies observed transactions touching a watched address set, from a
/// caller-maintained cursor onward. The poll cadence and stop condition
/// belong to the caller.
pub trait TxObserver {
    fn observations_since(
        &self,
        addresses: &[String],
        cursor: u64,
    ) -> Result<Vec<ObservedTx>, ClientError>;
}

/// Produces signed transaction bytes from an unsigned frame skeleton.
pub trait Signer {
    fn sign(&self, frame: &Frame) -> Result<Vec<u8>, ClientError>;
}

/// Submits signed transaction bytes, returning the transaction id.
pub trait Broadcaster {
    fn submit(&self, signed_tx: &[u8]) -> Result<String, ClientError>;
}
