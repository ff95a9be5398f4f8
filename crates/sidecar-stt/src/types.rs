//! Core value types shared by the STT facade and its backend implementations.

use serde::{Deserialize, Serialize};

/// Ordered enumeration from largest/most-accurate to smallest/fastest
/// (SPEC_FULL.md §3). The order is total and is the only thing downgrade/
/// upgrade steps are allowed to compare against — never a raw array index
/// (SPEC_FULL.md §9 "Model ordering").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelSize {
    Tiny,
    Base,
    Small,
    Medium,
    #[serde(rename = "large-v3")]
    LargeV3,
}

/// `SEQUENCE[0]` is the largest model; `Ord` is derived in that same
/// declaration order, so `ModelSize::LargeV3 > ModelSize::Tiny` holds
/// directly from the enum's variant order above.
const SEQUENCE: [ModelSize; 5] = [
    ModelSize::Tiny,
    ModelSize::Base,
    ModelSize::Small,
    ModelSize::Medium,
    ModelSize::LargeV3,
];

impl ModelSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelSize::Tiny => "tiny",
            ModelSize::Base => "base",
            ModelSize::Small => "small",
            ModelSize::Medium => "medium",
            ModelSize::LargeV3 => "large-v3",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        SEQUENCE.iter().copied().find(|m| m.as_str() == s)
    }

    /// The next smaller model, or `None` if already `Tiny` (the floor of
    /// the order). Downgrade logic must consult this rather than
    /// re-deriving an index.
    pub fn prev(&self) -> Option<ModelSize> {
        let idx = SEQUENCE.iter().position(|m| m == self)?;
        idx.checked_sub(1).map(|i| SEQUENCE[i])
    }

    /// The next larger model, or `None` if already `LargeV3`.
    pub fn next(&self) -> Option<ModelSize> {
        let idx = SEQUENCE.iter().position(|m| m == self)?;
        SEQUENCE.get(idx + 1).copied()
    }
}

impl std::fmt::Display for ModelSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A transcription result (SPEC_FULL.md §3). `is_final` distinguishes
/// incremental (partial) from definitive (final) outputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcription {
    pub text: String,
    pub is_final: bool,
    pub confidence: f32,
    pub language: String,
    pub processing_time_ms: u64,
    pub model_size: ModelSize,
}
