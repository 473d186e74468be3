//! Static value-plane alphabet.
//!
//! Maps upper-case letters, digits, punctuation, and a trio of control marks
//! to exact minor-unit amounts, so short plaintext can ride the value plane
//! directly. The mapping is intentionally static: constants here, with a
//! small comparison tolerance when reading amounts back off the chain.
//!
//! Letters occupy 22_659..=22_684, digits 22_648..=22_657, punctuation
//! 22_688..=22_699, and the control marks sit just below the digit range.

/// Default comparison tolerance in minor units. Amounts are exact integers,
/// so exact matching is the norm; observers of lossy sources can widen this.
pub const DEFAULT_TOLERANCE: u64 = 0;

const LETTER_BASE: u64 = 22_659;
const DIGIT_BASE: u64 = 22_648;

/// One alphabet mark: a literal character or a control code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mark {
    Char(char),
    Start,
    Accept,
    End,
}

#[derive(Debug, thiserror::Error)]
pub enum AlphabetError {
    #[error("unsupported character for the value alphabet: {0:?}")]
    UnsupportedChar(char),
    #[error("sequence is empty; start/end marks missing")]
    Empty,
    #[error("start/end marks not found around the sequence")]
    MissingMarkers,
}

/// Amount carrying `mark`, in minor units.
pub fn amount_for(mark: Mark) -> Option<u64> {
    match mark {
        Mark::Start => Some(22_611),
        Mark::Accept => Some(22_631),
        Mark::End => Some(22_621),
        Mark::Char(c) => {
            let c = if c.is_ascii_lowercase() {
                c.to_ascii_uppercase()
            } else {
                c
            };
            match c {
                'A'..='Z' => Some(LETTER_BASE + (c as u64 - 'A' as u64)),
                '0'..='9' => Some(DIGIT_BASE + (c as u64 - '0' as u64)),
                ' ' => Some(22_688),
                '.' => Some(22_689),
                ',' => Some(22_690),
                '!' => Some(22_691),
                '?' => Some(22_692),
                ':' => Some(22_693),
                '=' => Some(22_694),
                '+' => Some(22_695),
                '-' => Some(22_696),
                '*' => Some(22_697),
                '/' => Some(22_698),
                '_' => Some(22_699),
                _ => None,
            }
        }
    }
}

fn mark_for_exact(amount: u64) -> Option<Mark> {
    match amount {
        22_611 => Some(Mark::Start),
        22_631 => Some(Mark::Accept),
        22_621 => Some(Mark::End),
        a if (LETTER_BASE..LETTER_BASE + 26).contains(&a) => {
            Some(Mark::Char((b'A' + (a - LETTER_BASE) as u8) as char))
        }
        a if (DIGIT_BASE..DIGIT_BASE + 10).contains(&a) => {
            Some(Mark::Char((b'0' + (a - DIGIT_BASE) as u8) as char))
        }
        22_688 => Some(Mark::Char(' ')),
        22_689 => Some(Mark::Char('.')),
        22_690 => Some(Mark::Char(',')),
        22_691 => Some(Mark::Char('!')),
        22_692 => Some(Mark::Char('?')),
        22_693 => Some(Mark::Char(':')),
        22_694 => Some(Mark::Char('=')),
        22_695 => Some(Mark::Char('+')),
        22_696 => Some(Mark::Char('-')),
        22_697 => Some(Mark::Char('*')),
        22_698 => Some(Mark::Char('/')),
        22_699 => Some(Mark::Char('_')),
        _ => None,
    }
}

/// Closest mark for `amount`: `(mark, error)` when some mark lies within
/// `tolerance`, with the absolute difference to the nearest known code.
pub fn classify(amount: u64, tolerance: u64) -> (Option<Mark>, u64) {
    if let Some(mark) = mark_for_exact(amount) {
        return (Some(mark), 0);
    }
    let mut best: Option<(Mark, u64)> = None;
    for candidate in candidate_amounts() {
        let error = amount.abs_diff(candidate);
        if best.map_or(true, |(_, e)| error < e) {
            if let Some(mark) = mark_for_exact(candidate) {
                best = Some((mark, error));
            }
        }
    }
    match best {
        Some((mark, error)) if error <= tolerance => (Some(mark), error),
        Some((_, error)) => (None, error),
        None => (None, u64::MAX),
    }
}

fn candidate_amounts() -> impl Iterator<Item = u64> {
    (LETTER_BASE..LETTER_BASE + 26)
        .chain(DIGIT_BASE..DIGIT_BASE + 10)
        .chain(22_688..=22_699)
        .chain([22_611, 22_631, 22_621])
}

/// Encode `message` into an ordered amount sequence, normalizing lower-case
/// letters and optionally wrapping with start/end marks.
pub fn encode_message(message: &str, include_markers: bool) -> Result<Vec<u64>, AlphabetError> {
    let mut out = Vec::with_capacity(message.len() + 2);
    if include_markers {
        out.push(amount_for(Mark::Start).expect("start mark"));
    }
    for c in message.chars() {
        let amount =
            amount_for(Mark::Char(c)).ok_or(AlphabetError::UnsupportedChar(c))?;
        out.push(amount);
    }
    if include_markers {
        out.push(amount_for(Mark::End).expect("end mark"));
    }
    Ok(out)
}

/// Decode an amount sequence back into plaintext. Unknown amounts decode to
/// `?`; control marks inside the body are kept, lower-cased, so operators can
/// spot malformed or multi-part conversations.
pub fn decode_message(
    amounts: &[u64],
    require_markers: bool,
    tolerance: u64,
) -> Result<String, AlphabetError> {
    let mut body = amounts;
    if require_markers {
        if body.is_empty() {
            return Err(AlphabetError::Empty);
        }
        let (first, _) = classify(body[0], tolerance);
        let (last, _) = classify(body[body.len() - 1], tolerance);
        if first != Some(Mark::Start) || last != Some(Mark::End) {
            return Err(AlphabetError::MissingMarkers);
        }
        body = &body[1..body.len() - 1];
    }

    let mut out = String::with_capacity(body.len());
    for &amount in body {
        match classify(amount, tolerance).0 {
            Some(Mark::Char(c)) => out.push(c),
            Some(Mark::Start) => out.push_str("start"),
            Some(Mark::Accept) => out.push_str("accept"),
            Some(Mark::End) => out.push_str("end"),
            None => out.push('?'),
        }
    }
    Ok(out)
}
