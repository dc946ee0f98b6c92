//! Classification code extraction and ranking.

use crate::models::{CodeCount, SearchHit};
use std::collections::HashMap;

/// Splits a delimiter-joined classification field ("B64C39/02 | G05D1/10")
/// into trimmed, non-empty codes.
pub fn split_codes(raw: &str, delimiter: &str) -> Vec<String> {
    if delimiter.is_empty() {
        let code = raw.trim();
        return if code.is_empty() {
            Vec::new()
        } else {
            vec![code.to_string()]
        };
    }
    raw.split(delimiter)
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}

/// First `len` characters of a code, when the code is long enough and that
/// prefix is purely alphanumeric. Shorter codes are skipped.
pub fn normalize_prefix(code: &str, len: usize) -> Option<String> {
    let prefix: String = code.chars().take(len).collect();
    if prefix.chars().count() < len || !prefix.chars().all(char::is_alphanumeric) {
        return None;
    }
    Some(prefix)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeFrequencyAnalyzer {
    prefix_len: usize,
    top_n: usize,
}

impl Default for CodeFrequencyAnalyzer {
    fn default() -> Self {
        Self {
            prefix_len: 4,
            top_n: 5,
        }
    }
}

impl CodeFrequencyAnalyzer {
    pub fn new(prefix_len: usize, top_n: usize) -> Self {
        Self { prefix_len, top_n }
    }

    /// Counts every prefix occurrence across `hits`, repeats within one
    /// document included, in first-seen order.
    pub fn count(&self, hits: &[SearchHit]) -> Vec<CodeCount> {
        let mut order: Vec<CodeCount> = Vec::new();
        let mut slots: HashMap<String, usize> = HashMap::new();
        for code in hits.iter().flat_map(|h| h.classification_codes.iter()) {
            let Some(prefix) = normalize_prefix(code, self.prefix_len) else {
                continue;
            };
            match slots.get(&prefix) {
                Some(&slot) => order[slot].count += 1,
                None => {
                    slots.insert(prefix.clone(), order.len());
                    order.push(CodeCount {
                        code: prefix,
                        count: 1,
                    });
                }
            }
        }
        order
    }

    /// Top-N prefixes by count; ties keep first-seen order.
    pub fn top_codes(&self, hits: &[SearchHit]) -> Vec<CodeCount> {
        let mut counts = self.count(hits);
        // stable sort keeps first-seen order among equal counts
        counts.sort_by(|a, b| b.count.cmp(&a.count));
        counts.truncate(self.top_n);
        counts
    }
}
