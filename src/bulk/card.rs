//! Synthetic card records for the bulk demo.

use rand::Rng;
use serde::{Deserialize, Serialize};

const LOWER: &[u8] = b"abcdefghijklmnopqrstuvwxyz123456789";
const UPPER: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ123456789";
const FIELD_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CardMetaData {
    /// 32 characters from `[a-z1-9]`.
    pub card_id: String,
    /// 32 characters from `[A-Z1-9]`.
    pub tur: String,
}

impl CardMetaData {
    /// Draw both fields from `rng`.
    pub fn generate<R: Rng>(rng: &mut R) -> Self {
        Self {
            card_id: pattern(rng, LOWER),
            tur: pattern(rng, UPPER),
        }
    }

    /// `count` fresh cards.
    pub fn batch<R: Rng>(rng: &mut R, count: usize) -> Vec<Self> {
        (0..count).map(|_| Self::generate(rng)).collect()
    }
}

fn pattern<R: Rng>(rng: &mut R, alphabet: &[u8]) -> String {
    (0..FIELD_LEN)
        .map(|_| char::from(alphabet[rng.gen_range(0..alphabet.len())]))
        .collect()
}
