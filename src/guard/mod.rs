/*!
 * Hallucination guard: prompt augmentation and source-grounding checks.
 *
 * - `prompts`: guard instructions, evidence block, few-shot turns, temperature clamping
 * - `grounding`: lexical overlap check of a response against its source
 */

use serde::{Deserialize, Serialize};

use crate::errors::ConfigurationError;

pub use self::grounding::{
    check_source_grounding, GroundingResult, LexicalGroundingChecker, SourceGrounding,
    DEFAULT_MIN_OVERLAP_RATIO,
};
pub use self::prompts::{
    build_context_block, build_few_shot_turns, build_guarded_prompt, clamp_temperature, FewShotExample,
};

pub mod grounding;
pub mod prompts;

/// Guard settings for one completion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardOptions {
    /// Ask the model to reason step by step
    #[serde(default)]
    pub use_chain_of_thought: bool,

    /// Ask the model to review its draft against the input
    #[serde(default)]
    pub use_self_reflect: bool,

    /// Requested temperature, clamped before sending
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Run the grounding check on the response
    #[serde(default = "default_use_source_grounding")]
    pub use_source_grounding: bool,

    /// Threshold for the grounding check
    #[serde(default = "default_min_overlap_ratio")]
    pub min_overlap_ratio: f64,
}

fn default_temperature() -> f32 {
    prompts::DEFAULT_TEMPERATURE
}

fn default_use_source_grounding() -> bool {
    true
}

fn default_min_overlap_ratio() -> f64 {
    DEFAULT_MIN_OVERLAP_RATIO
}

impl Default for GuardOptions {
    fn default() -> Self {
        Self {
            use_chain_of_thought: false,
            use_self_reflect: false,
            temperature: default_temperature(),
            use_source_grounding: default_use_source_grounding(),
            min_overlap_ratio: default_min_overlap_ratio(),
        }
    }
}

impl GuardOptions {
    /// The "I don't know" instruction cannot be turned off
    pub fn use_idk_rule(&self) -> bool {
        true
    }

    /// Temperature actually sent to the model
    pub fn effective_temperature(&self) -> f32 {
        clamp_temperature(self.temperature)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if !(0.0..=1.0).contains(&self.min_overlap_ratio) {
            return Err(ConfigurationError::InvalidOverlapRatio(self.min_overlap_ratio));
        }
        Ok(())
    }
}
