//! Category label encoding
//!
//! Maps category labels to stable integer codes for model consumption.
//! Codes are assigned in order of first observation and never reassigned;
//! each extension bumps the encoder version so persisted snapshots can be
//! told apart.

use crate::error::EncoderError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Reserved label, always present with code 0
pub const UNKNOWN_CATEGORY: &str = "unknown";

/// What to do with a category the encoder has never seen at inference time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnseenCategoryPolicy {
    /// Assign the next free code in memory
    #[default]
    Extend,
    /// Encoder is frozen; use the code of [`UNKNOWN_CATEGORY`]
    MapToUnknown,
}

/// Versioned category → code mapping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryEncoder {
    codes: BTreeMap<String, u32>,
    next_code: u32,
    version: u64,
}

impl Default for CategoryEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl CategoryEncoder {
    pub fn new() -> Self {
        let mut codes = BTreeMap::new();
        codes.insert(UNKNOWN_CATEGORY.to_string(), 0);
        Self {
            codes,
            next_code: 1,
            version: 0,
        }
    }

    /// Code for a known category
    pub fn encode(&self, category: &str) -> Result<u32, EncoderError> {
        self.codes
            .get(normalize(category))
            .copied()
            .ok_or_else(|| EncoderError::UnknownCategory(category.to_string()))
    }

    /// Code for a category, registering it first if it is new
    pub fn fit_encode(&mut self, category: &str) -> u32 {
        let key = normalize(category);
        if let Some(code) = self.codes.get(key) {
            return *code;
        }
        let code = self.next_code;
        self.codes.insert(key.to_string(), code);
        self.next_code += 1;
        self.version += 1;
        code
    }

    /// Code for a category without mutating; unseen labels map to `unknown`
    pub fn encode_or_unknown(&self, category: &str) -> u32 {
        self.encode(category).unwrap_or(0)
    }

    pub fn contains(&self, category: &str) -> bool {
        self.codes.contains_key(normalize(category))
    }

    /// Number of known categories, including `unknown`
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Known categories ordered by code
    pub fn categories(&self) -> Vec<(String, u32)> {
        let mut entries: Vec<(String, u32)> = self
            .codes
            .iter()
            .map(|(label, code)| (label.clone(), *code))
            .collect();
        entries.sort_by_key(|(_, code)| *code);
        entries
    }
}

/// Labels are compared after trimming; an empty label is `unknown`
fn normalize(category: &str) -> &str {
    let trimmed = category.trim();
    if trimmed.is_empty() {
        UNKNOWN_CATEGORY
    } else {
        trimmed
    }
}
