//! Fragment identity hashing.
//!
//! Identities are 53-bit integers produced by a two-lane multiply-xor mix over the
//! UTF-16 code units of the normalized fragment text. Override tables authored by
//! users are keyed by these values, so the constants below must never change.

use std::fmt;

use serde::{Deserialize, Serialize};

const LANE1_INIT: u32 = 0xdead_beef;
const LANE2_INIT: u32 = 0x41c6_ce57;
const LANE1_MUL: u32 = 2_654_435_761;
const LANE2_MUL: u32 = 1_597_334_677;
const FINAL_MUL_A: u32 = 2_246_822_507;
const FINAL_MUL_B: u32 = 3_266_489_909;
const HIGH_MASK: u32 = 0x001f_ffff;

/// Hash `text` with the given seed into a 53-bit value.
pub fn hash(text: &str, seed: u32) -> u64 {
    let mut h1 = LANE1_INIT ^ seed;
    let mut h2 = LANE2_INIT ^ seed;

    for unit in text.encode_utf16() {
        let ch = u32::from(unit);
        h1 = (h1 ^ ch).wrapping_mul(LANE1_MUL);
        h2 = (h2 ^ ch).wrapping_mul(LANE2_MUL);
    }

    h1 = (h1 ^ (h1 >> 16)).wrapping_mul(FINAL_MUL_A) ^ (h2 ^ (h2 >> 13)).wrapping_mul(FINAL_MUL_B);
    h2 = (h2 ^ (h2 >> 16)).wrapping_mul(FINAL_MUL_A) ^ (h1 ^ (h1 >> 13)).wrapping_mul(FINAL_MUL_B);

    (u64::from(h2 & HIGH_MASK) << 32) | u64::from(h1)
}

/// Strip every whitespace character (line breaks included) and lowercase.
pub fn normalize(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Stable identity of a fragment, independent of formatting and case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FragmentId(u64);

impl FragmentId {
    /// Identity of raw fragment text (normalizes first).
    pub fn of(text: &str) -> Self {
        Self(hash(&normalize(text), 0))
    }

    pub fn from_raw(value: u64) -> Self {
        Self(value)
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for FragmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_matches_known_constant() {
        assert_eq!(hash("", 0), 3_338_908_027_751_811);
        assert_eq!(hash("", 1), 7_956_228_673_112_545);
    }

    #[test]
    fn known_values() {
        assert_eq!(hash("a", 0), 7_929_297_801_672_961);
        assert_eq!(hash("revenge", 0), 4_051_478_007_546_757);
        assert_eq!(hash("revenue", 0), 8_309_097_637_345_594);
    }

    #[test]
    fn fits_in_53_bits() {
        for s in ["", "x", "select 1", "ünïcödé ✓", "select * from t where id=$1"] {
            assert!(hash(s, 0) < (1u64 << 53), "{s} overflowed");
        }
    }

    #[test]
    fn deterministic() {
        let s = "select * from orders where id = $1";
        assert_eq!(hash(s, 0), hash(s, 0));
        assert_ne!(hash(s, 0), hash(s, 7));
    }

    #[test]
    fn normalize_is_idempotent() {
        let once = normalize("SELECT *\n  FROM\tT\r\n WHERE id = $1");
        assert_eq!(once, "select*fromtwhereid=$1");
        assert_eq!(normalize(&once), once);
    }

    #[test]
    fn identity_ignores_formatting() {
        let a = FragmentId::of("select * from t where id=$1");
        let b = FragmentId::of("\n    SELECT *\n    FROM t\n    WHERE id = $1\n");
        assert_eq!(a, b);
        assert_eq!(a.value(), 8_222_838_396_430_377);
        assert_ne!(a, FragmentId::of("select * from t where id=$2"));
    }
}
