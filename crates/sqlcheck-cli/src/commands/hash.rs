//! `sqlcheck hash` command implementation.

use sqlcheck_core::hash::{hash, normalize};

pub fn run(seed: u32, raw: bool, text: &str) {
    println!("{}", identity(seed, raw, text));
}

fn identity(seed: u32, raw: bool, text: &str) -> u64 {
    if raw {
        hash(text, seed)
    } else {
        hash(&normalize(text), seed)
    }
}
