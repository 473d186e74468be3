//! Parse dialect document source into the AST using PEST.

use crate::ast::*;
use crate::vector::Symmetry;
use pest::Parser;
use pest_derive::Parser as PestParser;

#[derive(PestParser)]
#[grammar = "grammar.pest"]
struct DialectParser;

/// Parse dialect source into a raw [`DialectDoc`]. Structural validation
/// happens later, at resolve time; this only enforces the grammar.
pub fn parse(source: &str) -> Result<DialectDoc, String> {
    let pairs = DialectParser::parse(Rule::dialect, source)
        .map_err(|e| format!("Parse error: {}", e))?;
    let pair = pairs.into_iter().next().ok_or("Empty parse")?;
    build_dialect(pair)
}

fn build_dialect(pair: pest::iterators::Pair<Rule>) -> Result<DialectDoc, String> {
    let mut name = String::new();
    let mut version = 0u64;
    let mut resolution = Resolution::RejectOverlap;
    let mut planes = None;
    let mut symbols = Vec::new();

    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::ident => name = inner.as_str().to_string(),
            Rule::version_field => version = parse_num(inner)?,
            Rule::resolution_field => {
                let kind = inner.into_inner().next().ok_or("resolution: missing kind")?;
                resolution = match kind.as_str() {
                    "declaration-order" => Resolution::DeclarationOrder,
                    _ => Resolution::RejectOverlap,
                };
            }
            Rule::planes_section => planes = Some(build_planes(inner)?),
            Rule::symbol_section => symbols.push(build_symbol(inner)?),
            _ => {}
        }
    }

    if name.is_empty() {
        return Err("dialect: missing name".to_string());
    }
    Ok(DialectDoc {
        name,
        version,
        resolution,
        planes: planes.ok_or("dialect must declare a planes section")?,
        symbols,
    })
}

fn build_planes(pair: pest::iterators::Pair<Rule>) -> Result<PlanesSection, String> {
    let mut value = Vec::new();
    let mut fee = Vec::new();
    let mut cardinality = CardinalityPlane {
        rules: Vec::new(),
        symmetry_threshold: 1,
    };
    let mut block = BlockPlane {
        cadence: 0,
        jitter: 1,
    };

    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::value_plane => {
                for decl in inner.into_inner() {
                    if decl.as_rule() == Rule::header_decl {
                        value.push(build_header(decl)?);
                    }
                }
            }
            Rule::fee_plane => {
                for decl in inner.into_inner() {
                    if decl.as_rule() == Rule::band_decl {
                        let mut nums = decl.into_inner().filter(|p| p.as_rule() == Rule::num);
                        let center = next_num(&mut nums, "band center")?;
                        let tolerance = next_num(&mut nums, "band tolerance")?;
                        fee.push(FeeBand { center, tolerance });
                    }
                }
            }
            Rule::cardinality_plane => {
                for item in inner.into_inner() {
                    match item.as_rule() {
                        Rule::rule_decl => {
                            let mut nums = item.into_inner().filter(|p| p.as_rule() == Rule::num);
                            let inputs = next_num(&mut nums, "rule inputs")? as u32;
                            let outputs = next_num(&mut nums, "rule outputs")? as u32;
                            cardinality.rules.push(CardinalityRule { inputs, outputs });
                        }
                        Rule::symmetry_threshold_field => {
                            cardinality.symmetry_threshold = parse_num(item)? as u32;
                        }
                        _ => {}
                    }
                }
            }
            Rule::block_plane => {
                for decl in inner.into_inner() {
                    if decl.as_rule() == Rule::cadence_decl {
                        let mut nums = decl.into_inner().filter(|p| p.as_rule() == Rule::num);
                        block.cadence = next_num(&mut nums, "cadence")?;
                        block.jitter = next_num(&mut nums, "jitter")?;
                    }
                }
            }
            _ => {}
        }
    }

    Ok(PlanesSection {
        value,
        fee,
        cardinality,
        block,
    })
}

fn build_header(pair: pest::iterators::Pair<Rule>) -> Result<ValueHeader, String> {
    let mut amount = None;
    let mut role = None;
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::num => amount = Some(parse_raw_num(inner.as_str())?),
            Rule::header_role => {
                role = Some(match inner.as_str() {
                    "anchor" => HeaderRole::Anchor,
                    _ => HeaderRole::Micro,
                });
            }
            _ => {}
        }
    }
    Ok(ValueHeader {
        amount: amount.ok_or("header: missing amount")?,
        role: role.ok_or("header: missing role")?,
    })
}

fn build_symbol(pair: pest::iterators::Pair<Rule>) -> Result<SymbolSection, String> {
    let mut name = String::new();
    let mut linked = false;
    let mut frames = Vec::new();
    let mut inline = InlinePredicate::default();
    let mut has_inline = false;

    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::ident => name = inner.as_str().to_string(),
            Rule::linked_flag => linked = true,
            Rule::frame_block => frames.push(build_predicate(inner.into_inner())?),
            _ => {
                has_inline = true;
                apply_predicate_field(&mut inline, inner)?;
            }
        }
    }

    if name.is_empty() {
        return Err("symbol: missing name".to_string());
    }
    let body = if !frames.is_empty() {
        if has_inline {
            return Err(format!(
                "symbol {name}: mixes frame blocks with inline predicate fields"
            ));
        }
        SymbolBody::Chain(frames)
    } else {
        SymbolBody::Single(inline.finish(&name)?)
    };
    Ok(SymbolSection { name, linked, body })
}

fn build_predicate(
    fields: pest::iterators::Pairs<Rule>,
) -> Result<FramePredicate, String> {
    let mut inline = InlinePredicate::default();
    for field in fields {
        apply_predicate_field(&mut inline, field)?;
    }
    inline.finish("frame")
}

/// Accumulates predicate fields until `value` is known.
#[derive(Default)]
struct InlinePredicate {
    value: Option<u64>,
    fee: Option<u64>,
    cardinality: Option<CardinalityRule>,
    delta: Option<u64>,
    symmetry: Option<Symmetry>,
    order: OutputOrder,
    aux: AuxRule,
}

impl InlinePredicate {
    fn finish(self, context: &str) -> Result<FramePredicate, String> {
        Ok(FramePredicate {
            value: self
                .value
                .ok_or_else(|| format!("{context}: predicate missing value"))?,
            fee: self.fee,
            cardinality: self.cardinality,
            delta: self.delta,
            symmetry: self.symmetry,
            order: self.order,
            aux: self.aux,
        })
    }
}

fn apply_predicate_field(
    pred: &mut InlinePredicate,
    field: pest::iterators::Pair<Rule>,
) -> Result<(), String> {
    match field.as_rule() {
        Rule::value_field => pred.value = Some(parse_num(field)?),
        Rule::fee_field => pred.fee = Some(parse_num(field)?),
        Rule::cardinality_field => {
            let mut nums = field.into_inner().filter(|p| p.as_rule() == Rule::num);
            let inputs = next_num(&mut nums, "cardinality inputs")? as u32;
            let outputs = next_num(&mut nums, "cardinality outputs")? as u32;
            pred.cardinality = Some(CardinalityRule { inputs, outputs });
        }
        Rule::delta_field => pred.delta = Some(parse_num(field)?),
        Rule::symmetry_field => {
            let kind = field.into_inner().next().ok_or("symmetry: missing kind")?;
            pred.symmetry = Some(match kind.as_str() {
                "mirrored" => Symmetry::Mirrored,
                "asymmetric" => Symmetry::Asymmetric,
                _ => Symmetry::Neutral,
            });
        }
        Rule::order_field => {
            let kind = field.into_inner().next().ok_or("order: missing kind")?;
            pred.order = match kind.as_str() {
                "reversed" => OutputOrder::Reversed,
                _ => OutputOrder::Canonical,
            };
        }
        Rule::aux_field => {
            let kind = field.into_inner().next().ok_or("aux: missing kind")?;
            pred.aux = match kind.as_str() {
                "absent" => AuxRule::Absent,
                "required" => AuxRule::Required,
                _ => AuxRule::Any,
            };
        }
        other => return Err(format!("unexpected predicate field: {:?}", other)),
    }
    Ok(())
}

fn parse_num(pair: pest::iterators::Pair<Rule>) -> Result<u64, String> {
    let num = pair
        .into_inner()
        .find(|p| p.as_rule() == Rule::num)
        .ok_or("missing number")?;
    parse_raw_num(num.as_str())
}

fn next_num<'a>(
    nums: &mut impl Iterator<Item = pest::iterators::Pair<'a, Rule>>,
    what: &str,
) -> Result<u64, String> {
    let pair = nums.next().ok_or_else(|| format!("missing {what}"))?;
    parse_raw_num(pair.as_str())
}

fn parse_raw_num(s: &str) -> Result<u64, String> {
    s.parse::<u64>().map_err(|_| format!("invalid number: {s}"))
}
