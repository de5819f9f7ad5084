//! Local BM25-style sparse embedder.
//!
//! Terms are lowercased alphanumeric tokens hashed to a stable 32-bit
//! index; weights use BM25 term-frequency saturation against a fixed
//! average document length, so the same text always produces the same
//! vector without any corpus statistics.

use std::collections::BTreeMap;
use std::hash::Hasher;

use async_trait::async_trait;
use regex::Regex;
use twox_hash::XxHash32;

use crate::core::errors::RagError;

use super::{SparseEmbedder, SparseVector};

const K1: f32 = 1.2;
const B: f32 = 0.75;
const AVG_LEN: f32 = 256.0;

pub struct Bm25SparseEmbedder {
    token_re: Regex,
}

impl Bm25SparseEmbedder {
    pub fn new() -> Self {
        Self {
            // unwrap is fine for a literal pattern
            token_re: Regex::new(r"[\p{L}\p{N}]+").expect("valid token pattern"),
        }
    }

    fn term_index(token: &str) -> u32 {
        let mut hasher = XxHash32::with_seed(0);
        hasher.write(token.as_bytes());
        hasher.finish() as u32
    }
}

impl Default for Bm25SparseEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SparseEmbedder for Bm25SparseEmbedder {
    async fn embed(&self, text: &str) -> Result<SparseVector, RagError> {
        let tokens: Vec<String> = self
            .token_re
            .find_iter(&text.to_lowercase())
            .map(|m| m.as_str().to_string())
            .collect();

        if tokens.is_empty() {
            return Ok(SparseVector::default());
        }

        let doc_len = tokens.len() as f32;
        let mut counts: BTreeMap<u32, f32> = BTreeMap::new();
        for token in &tokens {
            *counts.entry(Self::term_index(token)).or_insert(0.0) += 1.0;
        }

        let norm = K1 * (1.0 - B + B * doc_len / AVG_LEN);
        let mut indices = Vec::with_capacity(counts.len());
        let mut values = Vec::with_capacity(counts.len());
        for (index, tf) in counts {
            indices.push(index);
            values.push(tf * (K1 + 1.0) / (tf + norm));
        }

        Ok(SparseVector { indices, values })
    }
}
