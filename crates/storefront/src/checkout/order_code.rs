//! Human-readable order codes: `ORD-YYYYMMDD-XXXXXX`.

use chrono::{DateTime, Utc};
use rand::seq::IndexedRandom;

/// Unambiguous code alphabet (no `I`, `O`, `0`, `1`).
const ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

const SUFFIX_LEN: usize = 6;

/// Attempts at inserting an order before giving up on code collisions.
pub const MAX_CODE_ATTEMPTS: u32 = 3;

/// Generate a code for an order placed at `at`.
#[must_use]
pub fn generate(at: DateTime<Utc>) -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..SUFFIX_LEN)
        .filter_map(|_| ALPHABET.choose(&mut rng).copied().map(char::from))
        .collect();
    format!("ORD-{}-{suffix}", at.format("%Y%m%d"))
}
