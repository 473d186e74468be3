//! Encode a heartbeat against fake collaborators, wrap it as observed
//! traffic, and decode it back. Run with: cargo run --example roundtrip

use anyhow::{Context, Result};
use chainsig::client::{ClientError, CoinSource, HeightSource};
use chainsig::decoder::Decoder;
use chainsig::dialect::Dialect;
use chainsig::encoder::Encoder;
use chainsig::observe::{ObservedTx, OutPoint, TxOut};
use chainsig::packet::Gap;
use chainsig::planner::{Coin, FundingRef};

const DIALECT: &str = r#"
dialect demo-v1 {
	version: 1;

	planes {
		value {
			header 700000000 anchor;
		}
		fee {
			band 21000000 tolerance 500000;
		}
		cardinality {
			rule 3:3;
		}
		block {
			cadence 3 jitter 1;
		}
	}

	symbol HEARTBEAT {
		value: 700000000;
		fee: 21000000;
		cardinality: 3:3;
		delta: 3;
	}
}
"#;

struct FakeWallet;

impl CoinSource for FakeWallet {
    fn list_spendable(&self, _min_confirmations: u32) -> Result<Vec<Coin>, ClientError> {
        Ok((0..3)
            .map(|i| Coin {
                outpoint: OutPoint::new(format!("fund-{i}"), 0),
                amount: 1_000_000_000,
                confirmations: 12,
            })
            .collect())
    }
}

struct FakeChain;

impl HeightSource for FakeChain {
    fn current_height(&self) -> Result<u64, ClientError> {
        Ok(18_200_000)
    }
}

fn main() -> Result<()> {
    let dialect = Dialect::load_str(DIALECT).context("load dialect")?;
    let encoder = Encoder::new(&dialect);
    let mut rng = rand::thread_rng();

    let frames = encoder
        .encode_from_sources("HEARTBEAT", &FakeWallet, &FakeChain, 1, &mut rng)
        .context("encode HEARTBEAT")?;
    let frame = &frames[0];
    println!(
        "planned frame: {} inputs, {} outputs, fee {}, height hint {:?}",
        frame.inputs.len(),
        frame.outputs.len(),
        frame.fee,
        frame.height_hint
    );

    // Stand in for the signer/broadcaster/observer loop: wrap the frame as
    // the transaction a watcher would report back.
    let observed = ObservedTx {
        txid: "demo-heartbeat".to_string(),
        height: frame.height_hint.unwrap_or(18_200_003),
        timestamp: 1_760_000_000,
        inputs: frame
            .inputs
            .iter()
            .map(|input| match &input.funding {
                FundingRef::Coin(outpoint) => outpoint.clone(),
                FundingRef::PreviousChange { .. } => unreachable!("single frame"),
            })
            .collect(),
        outputs: frame
            .outputs
            .iter()
            .map(|o| TxOut {
                amount: o.amount,
                script_ref: "watched".to_string(),
            })
            .collect(),
        fee: frame.fee,
        aux: None,
    };

    let decoder = Decoder::new(&dialect);
    for result in decoder.decode_stream(vec![observed], Gap::Blocks(3)) {
        println!("decoded: {:?}", result.outcome);
    }
    Ok(())
}
