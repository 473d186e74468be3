//! Dialect document tests: parsing, validation, ambiguity policy, load-from-file.

use chainsig::dialect::{Dialect, DialectError, MatchOutcome};
use chainsig::lint::{CheckRule, Severity};
use chainsig::vector::{StateVector, Symmetry};
use chainsig::{HeaderRole, Resolution};
use std::io::Write;

const OPS_V1: &str = r#"
dialect ops-v1 {
	version: 1;

	planes {
		value {
			header 700000000 anchor;
			header 5000000 micro;
		}
		fee {
			band 21000000 tolerance 500000;
		}
		cardinality {
			rule 3:3;
			rule 1:2;
			symmetry-threshold: 1;
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

	symbol PING {
		value: 5000000;
		fee: 21000000;
		cardinality: 1:2;
	}

	symbol SWEEP linked {
		frame { value: 700000000; fee: 21000000; delta: 3; }
		frame { value: 5000000; fee: 21000000; delta: 3; }
	}
}
"#;

fn vector(value: u64, fee: u64, m: u32, n: u32, delta: Option<i64>) -> StateVector {
    StateVector {
        value,
        fee,
        in_count: m,
        out_count: n,
        block_delta: delta,
        symmetry: Symmetry::Neutral,
        aux: None,
    }
}

#[test]
fn loads_and_indexes_symbols() {
    let dialect = Dialect::load_str(OPS_V1).expect("load");
    assert_eq!(dialect.name(), "ops-v1");
    assert_eq!(dialect.version(), 1);
    assert_eq!(dialect.resolution(), Resolution::RejectOverlap);
    assert_eq!(dialect.symbols().count(), 3);

    let sweep = dialect.symbol("SWEEP").expect("SWEEP");
    assert!(sweep.linked);
    assert_eq!(sweep.frame_count(), 2);
    assert!(dialect.symbol("NOPE").is_none());

    let anchor = dialect.header(700000000).expect("anchor header");
    assert_eq!(anchor.role, HeaderRole::Anchor);
    assert_eq!(dialect.header(5000000).map(|h| h.role), Some(HeaderRole::Micro));
}

#[test]
fn loads_from_a_file_path() {
    let mut file = tempfile::NamedTempFile::new().expect("tempfile");
    file.write_all(OPS_V1.as_bytes()).expect("write");
    let dialect = Dialect::load_file(file.path()).expect("load_file");
    assert_eq!(dialect.name(), "ops-v1");
}

#[test]
fn missing_file_is_an_io_error() {
    let err = Dialect::load_file("/nonexistent/dialect.sig").unwrap_err();
    assert!(matches!(err, DialectError::Io(_)));
}

#[test]
fn garbage_source_is_a_parse_error() {
    let err = Dialect::load_str("planes without a dialect").unwrap_err();
    assert!(matches!(err, DialectError::Parse(_)));
}

#[test]
fn symbol_without_declared_header_is_rejected() {
    let src = OPS_V1.replace("value: 5000000;\n\t\tfee: 21000000;\n\t\tcardinality: 1:2;", "value: 42;");
    let err = Dialect::load_str(&src).unwrap_err();
    match err {
        DialectError::Invalid { findings, .. } => {
            assert!(findings
                .iter()
                .any(|f| f.rule == CheckRule::UndeclaredHeader));
        }
        other => panic!("expected Invalid, got {other}"),
    }
}

#[test]
fn overlapping_symbols_fail_to_load_by_default() {
    let src = OPS_V1.replace(
        "symbol PING {\n\t\tvalue: 5000000;\n\t\tfee: 21000000;\n\t\tcardinality: 1:2;",
        "symbol PING {\n\t\tvalue: 700000000;\n\t\tfee: 21000000;",
    );
    let err = Dialect::load_str(&src).unwrap_err();
    match err {
        DialectError::Invalid { findings, .. } => {
            assert!(findings
                .iter()
                .any(|f| f.rule == CheckRule::PredicateOverlap));
        }
        other => panic!("expected Invalid, got {other}"),
    }
}

#[test]
fn declaration_order_opt_in_permits_overlap_and_picks_first() {
    let src = OPS_V1
        .replace("version: 1;", "version: 1;\n\tresolution: declaration-order;")
        .replace(
            "symbol PING {\n\t\tvalue: 5000000;\n\t\tfee: 21000000;\n\t\tcardinality: 1:2;",
            "symbol PING {\n\t\tvalue: 700000000;\n\t\tfee: 21000000;\n\t\tcardinality: 3:3;\n\t\tdelta: 3;",
        );
    let dialect = Dialect::load_str(&src).expect("load with opt-in");
    assert!(dialect
        .warnings()
        .iter()
        .any(|w| w.rule == CheckRule::PredicateOverlap && w.severity == Severity::Warning));

    let v = vector(700000000, 21000000, 3, 3, Some(3));
    match dialect.match_vector(&v) {
        MatchOutcome::Symbol(symbol) => assert_eq!(symbol.name, "HEARTBEAT"),
        other => panic!("expected first-match-wins, got {other:?}"),
    }
}

#[test]
fn first_frame_sentinel_can_make_distinct_deltas_ambiguous() {
    // ALPHA and BETA differ only in delta, far enough apart to be statically
    // disjoint; a first-in-stream vector has no reference point and satisfies
    // both. That residual ambiguity must be surfaced, not resolved.
    let src = r#"
dialect deltas {
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
			rule 1:2;
		}
		block {
			cadence 3 jitter 1;
		}
	}
	symbol ALPHA {
		value: 700000000;
		delta: 3;
	}
	symbol BETA {
		value: 700000000;
		delta: 10;
	}
}
"#;
    let dialect = Dialect::load_str(src).expect("statically disjoint by delta");

    let first = vector(700000000, 21000000, 3, 3, None);
    match dialect.match_vector(&first) {
        MatchOutcome::Ambiguous(candidates) => {
            let names: Vec<_> = candidates.iter().map(|s| s.name.as_str()).collect();
            assert_eq!(names, vec!["ALPHA", "BETA"]);
        }
        other => panic!("expected Ambiguous, got {other:?}"),
    }

    // With a reference point the delta plane separates them again.
    let settled = vector(700000000, 21000000, 3, 3, Some(10));
    match dialect.match_vector(&settled) {
        MatchOutcome::Symbol(symbol) => assert_eq!(symbol.name, "BETA"),
        other => panic!("expected BETA, got {other:?}"),
    }
}

#[test]
fn chain_with_one_frame_is_rejected() {
    let src = OPS_V1.replace(
        "frame { value: 5000000; fee: 21000000; delta: 3; }\n\t}",
        "}",
    );
    let err = Dialect::load_str(&src).unwrap_err();
    match err {
        DialectError::Invalid { findings, .. } => {
            assert!(findings.iter().any(|f| f.rule == CheckRule::ChainTooShort));
        }
        other => panic!("expected Invalid, got {other}"),
    }
}

#[test]
fn zero_cardinality_is_rejected() {
    let src = OPS_V1.replace("cardinality: 1:2;", "cardinality: 0:2;");
    let err = Dialect::load_str(&src).unwrap_err();
    match err {
        DialectError::Invalid { findings, .. } => {
            assert!(findings
                .iter()
                .any(|f| f.rule == CheckRule::DegenerateCardinality));
        }
        other => panic!("expected Invalid, got {other}"),
    }
}

#[test]
fn fee_band_tolerance_bounds_matching() {
    let dialect = Dialect::load_str(OPS_V1).expect("load");
    let inside = vector(700000000, 21500000, 3, 3, Some(3));
    assert!(matches!(
        dialect.match_vector(&inside),
        MatchOutcome::Symbol(s) if s.name == "HEARTBEAT"
    ));
    let outside = vector(700000000, 21500001, 3, 3, Some(3));
    assert!(matches!(dialect.match_vector(&outside), MatchOutcome::NoMatch));
}

#[test]
fn cadence_jitter_bounds_delta_matching() {
    let dialect = Dialect::load_str(OPS_V1).expect("load");
    for (delta, expect_match) in [(2, true), (3, true), (4, true), (5, false)] {
        let v = vector(700000000, 21000000, 3, 3, Some(delta));
        let matched = matches!(dialect.match_vector(&v), MatchOutcome::Symbol(_));
        assert_eq!(matched, expect_match, "delta {delta}");
    }
}

#[test]
fn noise_vector_matches_nothing() {
    let dialect = Dialect::load_str(OPS_V1).expect("load");
    let v = vector(123456789, 1000, 1, 1, None);
    assert!(matches!(dialect.match_vector(&v), MatchOutcome::NoMatch));
}
