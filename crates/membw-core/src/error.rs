//! Model-invariant violations.
//!
//! These are distinct from the CLI's user-facing argument errors: every
//! variant here means a stage produced output that violates a probability
//! or combinatorial invariant the rest of the pipeline depends on, and the
//! computation cannot be trusted past that point.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ModelError>;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("probability mass for {stage} sums to {observed}, expected {expected} \u{b1} {tolerance}")]
    ProbabilityMass {
        stage: String,
        expected: f64,
        observed: f64,
        tolerance: f64,
    },

    #[error("reuse distance {dist} not found in thread info during {stage}")]
    ReuseDistanceNotFound { dist: usize, stage: &'static str },

    #[error("access-state case probabilities sum to {observed}, expected 1.0 \u{b1} {tolerance}")]
    CaseProbabilitySum { observed: f64, tolerance: f64 },

    #[error("case reports {observed} target-channel accesses, sequence expects {expected}")]
    TotalAccessMismatch { expected: usize, observed: usize },

    #[error("resolver reached an unreachable branch: {detail}")]
    ResolverUnreachable { detail: String },

    #[error("V3 access sequence generated {observed} slots, expected {expected}")]
    V3LengthMismatch { expected: usize, observed: usize },

    #[error("V3 access sequence probabilities sum to {0}, expected 1.0")]
    V3ProbabilitySum(f64),

    #[error("V4 access sequence probabilities sum to {0}, expected 1.0")]
    V4ProbabilitySum(f64),

    #[error("unknown step {version} for {stage}")]
    UnknownStepVersion { stage: &'static str, version: u8 },

    #[error("parameter file error: {0}")]
    ParamFile(String),
}
