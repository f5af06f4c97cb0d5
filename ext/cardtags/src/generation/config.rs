use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::decoder::UnseededPolicy;
use crate::error::Result;

/// Configuration for constrained generation and target length
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// The maximum number of tokens in a sequence, seed tag included.
    /// Training labels are padded or cut to the same length.
    pub max_length: usize,
    /// The temperature for sampling; 0 means greedy decoding
    pub temperature: f64,
    /// The top-p value for nucleus sampling
    pub top_p: Option<f64>,
    /// Random seed for sampling
    pub seed: u64,
    /// Behaviour when a history has no tag yet
    pub unseeded_policy: UnseededPolicy,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_length: 768,
            temperature: 0.0,
            top_p: None,
            seed: 42,
            unseeded_policy: UnseededPolicy::Reject,
        }
    }
}

impl GenerationConfig {
    /// Greedy decoding
    pub fn deterministic() -> Self {
        Self::default()
    }

    /// Sampled decoding with the given temperature and nucleus cut-off
    pub fn sampled(temperature: f64, top_p: Option<f64>) -> Self {
        Self {
            temperature,
            top_p,
            ..Default::default()
        }
    }

    /// Read a JSON config; missing keys take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}
