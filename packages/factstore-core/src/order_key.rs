use std::cmp::Ordering;

use rand::Rng;

use crate::error::{Error, Result};
use crate::ids::Timestamp;

const SUFFIX_WIDTH: usize = 3;
const MIN_DIGIT: u8 = b'0';
const MAX_DIGIT: u8 = b'9';
const CREATION_KEY_WIDTH: usize = 19;

/// Default key for a record that was never explicitly reordered.
///
/// Fixed-width ticks keep lexicographic order chronological. The trailing `1`
/// keeps every key ending in a non-zero digit, which is what guarantees a
/// free key between any two distinct keys.
pub fn creation_key(timestamp: Timestamp) -> String {
    format!("{:0width$}1", timestamp.ticks(), width = CREATION_KEY_WIDTH)
}

pub fn compare_keys(a: &str, b: &str) -> Ordering {
    a.as_bytes().cmp(b.as_bytes())
}

/// Allocate a key strictly between `left` and `right` (lexicographic order).
///
/// Keys are decimal digit strings of arbitrary length that never end in `0`.
/// Neighbours may be given in either order; the smaller one is the low bound.
pub fn allocate_between<R: Rng>(left: Option<&str>, right: Option<&str>, rng: &mut R) -> Result<String> {
    for key in [left, right].into_iter().flatten() {
        validate(key)?;
    }

    match (left, right) {
        (Some(a), Some(b)) => {
            let (lo, hi) = match compare_keys(a, b) {
                Ordering::Less => (a, b),
                Ordering::Greater => (b, a),
                Ordering::Equal => {
                    return Err(Error::OrdinalCollision(format!(
                        "both neighbours share ordinal `{a}`"
                    )))
                }
            };
            // Each round pushes the random digits one place further right; once
            // the padding outgrows `hi`, no later round can succeed.
            for padding in 0..=hi.len() {
                let candidate = format!("{lo}{}{}", "0".repeat(padding), random_suffix(rng));
                if compare_keys(&candidate, hi) == Ordering::Less {
                    return Ok(candidate);
                }
            }
            Err(Error::OrdinalCollision(format!(
                "no key fits between `{lo}` and `{hi}`"
            )))
        }
        (Some(lo), None) => Ok(format!("{lo}{}", random_suffix(rng))),
        (None, Some(hi)) => {
            let digits = hi.as_bytes();
            let pivot = digits
                .iter()
                .rposition(|&d| d != MIN_DIGIT)
                .ok_or_else(|| Error::OrdinalCollision(format!("no key sorts before `{hi}`")))?;
            let mut out = Vec::with_capacity(digits.len() + SUFFIX_WIDTH);
            out.extend_from_slice(&digits[..pivot]);
            out.push(digits[pivot] - 1);
            out.resize(digits.len(), MAX_DIGIT);
            let mut key: String = out.into_iter().map(char::from).collect();
            key.push_str(&random_suffix(rng));
            Ok(key)
        }
        (None, None) => Ok(random_suffix(rng)),
    }
}

fn random_suffix<R: Rng>(rng: &mut R) -> String {
    let mut suffix = String::with_capacity(SUFFIX_WIDTH);
    for _ in 0..SUFFIX_WIDTH - 1 {
        suffix.push(char::from(rng.gen_range(MIN_DIGIT..=MAX_DIGIT)));
    }
    suffix.push(char::from(rng.gen_range(MIN_DIGIT + 1..=MAX_DIGIT)));
    suffix
}

pub(crate) fn validate(key: &str) -> Result<()> {
    if key.is_empty() || !key.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::InvalidOperation(format!(
            "ordinal key `{key}` must be a non-empty digit string"
        )));
    }
    if key.ends_with('0') {
        return Err(Error::InvalidOperation(format!(
            "ordinal key `{key}` must not end in `0`"
        )));
    }
    Ok(())
}
