//! Observation model: transactions as seen by a watcher, plus the
//! auxiliary-plane payload codec.
//!
//! `ObservedTx` is the decoder-side view of one ledger transaction. It carries
//! only the fields the protocol planes read: height, timestamp, input
//! references, output list, fee, and the optional auxiliary payload. The
//! observer collaborator (see [`crate::client`]) is responsible for producing
//! these from whatever node interface it has.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::Read;

/// Reference to a spendable transaction output.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OutPoint {
    pub txid: String,
    pub vout: u32,
}

impl OutPoint {
    pub fn new(txid: impl Into<String>, vout: u32) -> Self {
        OutPoint {
            txid: txid.into(),
            vout,
        }
    }
}

/// One created output: amount in minor units plus an opaque script reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOut {
    pub amount: u64,
    pub script_ref: String,
}

/// A transaction observed on the ledger, reduced to the protocol planes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedTx {
    pub txid: String,
    pub height: u64,
    /// Unix seconds.
    pub timestamp: u64,
    pub inputs: Vec<OutPoint>,
    pub outputs: Vec<TxOut>,
    /// Total fee in minor units.
    pub fee: u64,
    /// Auxiliary-plane payload, already stripped of its framing.
    pub aux: Option<Vec<u8>>,
}

impl ObservedTx {
    /// True if any input spends `outpoint`.
    pub fn spends(&self, outpoint: &OutPoint) -> bool {
        self.inputs.iter().any(|i| i == outpoint)
    }
}

/// Auxiliary payloads ride in a constrained carrier (a data-only output), so
/// the framed form is capped at 80 bytes total.
pub const AUX_PAYLOAD_CAP: usize = 80;

#[derive(Debug, thiserror::Error)]
pub enum AuxError {
    #[error("aux payload of {len} bytes exceeds the {cap}-byte carrier cap")]
    Oversized { len: usize, cap: usize },
    #[error("aux frame truncated: declared {declared} bytes, found {found}")]
    Truncated { declared: usize, found: usize },
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
}

/// Frame an aux payload: u16 little-endian length prefix, then the bytes.
pub fn encode_aux_payload(data: &[u8]) -> Result<Vec<u8>, AuxError> {
    let framed_len = data.len() + 2;
    if framed_len > AUX_PAYLOAD_CAP {
        return Err(AuxError::Oversized {
            len: data.len(),
            cap: AUX_PAYLOAD_CAP - 2,
        });
    }
    let mut out = Vec::with_capacity(framed_len);
    out.write_u16::<LittleEndian>(data.len() as u16)?;
    out.extend_from_slice(data);
    Ok(out)
}

/// Unframe an aux payload produced by [`encode_aux_payload`].
pub fn decode_aux_payload(bytes: &[u8]) -> Result<Vec<u8>, AuxError> {
    let mut cursor = std::io::Cursor::new(bytes);
    let declared = cursor.read_u16::<LittleEndian>()? as usize;
    let mut data = vec![0u8; declared];
    cursor.read_exact(&mut data).map_err(|_| AuxError::Truncated {
        declared,
        found: bytes.len().saturating_sub(2),
    })?;
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aux_payload_frames_and_unframes() {
        let framed = encode_aux_payload(b"presence:hi").expect("encode");
        assert_eq!(framed.len(), 2 + 11);
        let data = decode_aux_payload(&framed).expect("decode");
        assert_eq!(data, b"presence:hi");
    }

    #[test]
    fn aux_payload_rejects_oversized() {
        let big = vec![0u8; AUX_PAYLOAD_CAP];
        assert!(matches!(
            encode_aux_payload(&big),
            Err(AuxError::Oversized { .. })
        ));
    }

    #[test]
    fn aux_payload_rejects_truncated_frame() {
        let mut framed = encode_aux_payload(b"chopped").expect("encode");
        framed.truncate(4);
        assert!(matches!(
            decode_aux_payload(&framed),
            Err(AuxError::Truncated { .. })
        ));
    }
}
