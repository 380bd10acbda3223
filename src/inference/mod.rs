//! Metropolis-Hastings sampling over bounded parameter vectors.

use thiserror::Error;

use crate::utils::usize_to_f64;

pub mod diagnostics;
pub mod proposal;
pub mod sampler;

pub use diagnostics::{
    ChainSummary, ParameterSummary, autocorrelation, effective_sample_size, split_rhat,
    summarize_chain,
};
pub use proposal::{Bounds, reflect, reflected_proposal};
pub use sampler::{
    Chain, Objective, componentwise_step, run_chain, run_chain_with_rng, run_chains,
};

/// Errors for sampler configuration and execution.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum InferenceError {
    #[error("iterations must be positive")]
    InvalidIterations,
    #[error("burn-in ({burn_in}) must be smaller than iterations ({iterations})")]
    InvalidBurnIn { burn_in: usize, iterations: usize },
    #[error("thinning interval must be positive")]
    InvalidThinning,
    #[error("proposal scale must be positive and finite; found {0}")]
    InvalidScale(f64),
    #[error("parameter vector has {found} components; bounds have {expected}")]
    DimensionMismatch { expected: usize, found: usize },
    #[error("lower bound ({lower}) exceeds upper bound ({upper}) for component {index}")]
    InvertedBounds { index: usize, lower: f64, upper: f64 },
    #[error("component {index} ({value}) lies outside [{lower}, {upper}]")]
    OutOfBounds {
        index: usize,
        value: f64,
        lower: f64,
        upper: f64,
    },
    #[error("objective takes {expected} parameters; found {found}")]
    ObjectiveDimension { expected: usize, found: usize },
    #[error("parameter vector must have at least one component")]
    EmptyParameters,
    #[error(
        "fun(par) is undefined ({value}) at {}; check either the objective or the bounds",
        describe_iteration(.iteration)
    )]
    UndefinedObjective { iteration: Option<usize>, value: f64 },
    #[error("multi-chain workflows require at least {min} chains; found {found}")]
    InvalidChainCount { min: usize, found: usize },
    #[error("multi-chain seed stride must be positive")]
    InvalidSeedStride,
    #[error("each chain must retain at least {minimum} draws; minimum found {found}")]
    InsufficientChainDraws { minimum: usize, found: usize },
    #[error("chains differ in parameter dimension")]
    InconsistentChainDimensions,
    #[error("{found} parameter names given for a chain with {expected} columns")]
    NameCount { expected: usize, found: usize },
}

#[allow(clippy::ref_option)]
fn describe_iteration(iteration: &Option<usize>) -> String {
    iteration.map_or_else(|| "the initial value".to_string(), |i| format!("iteration {i}"))
}

/// Proposal mechanism used for each iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SamplerKind {
    /// Accept or reject the full reflected proposal at once.
    #[default]
    Joint,
    /// Accept or reject each component of one shared reflected proposal in turn.
    Componentwise,
}

/// Chain schedule and proposal configuration.
#[derive(Debug, Clone, Copy)]
pub struct ChainConfig {
    /// Number of iterations (rows of the returned chain).
    pub iterations: usize,
    /// Standard deviation of the Gaussian random-walk proposal.
    pub scale: f64,
    /// RNG seed for reproducibility.
    pub seed: u64,
    pub kind: SamplerKind,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            iterations: 1_000,
            scale: 0.01,
            seed: 42,
            kind: SamplerKind::Joint,
        }
    }
}

impl ChainConfig {
    /// # Errors
    ///
    /// Returns `InferenceError` if the schedule or scale is invalid.
    pub fn validate(self) -> Result<(), InferenceError> {
        if self.iterations == 0 {
            return Err(InferenceError::InvalidIterations);
        }
        if !(self.scale.is_finite() && self.scale > 0.0) {
            return Err(InferenceError::InvalidScale(self.scale));
        }
        Ok(())
    }
}

/// Post-processing applied when summarizing a chain.
#[derive(Debug, Clone, Copy)]
pub struct SummaryOptions {
    /// Leading draws discarded before summarizing.
    pub burn_in: usize,
    /// Keep every `thin`-th draw after burn-in.
    pub thin: usize,
}

impl Default for SummaryOptions {
    fn default() -> Self {
        Self {
            burn_in: 0,
            thin: 1,
        }
    }
}

impl SummaryOptions {
    /// # Errors
    ///
    /// Returns `InferenceError` if burn-in consumes the chain or thinning is zero.
    pub const fn validate(self, iterations: usize) -> Result<(), InferenceError> {
        if iterations == 0 {
            return Err(InferenceError::InvalidIterations);
        }
        if self.burn_in >= iterations {
            return Err(InferenceError::InvalidBurnIn {
                burn_in: self.burn_in,
                iterations,
            });
        }
        if self.thin == 0 {
            return Err(InferenceError::InvalidThinning);
        }
        Ok(())
    }

    /// Row indices retained from a chain with `iterations` rows.
    pub fn retained(self, iterations: usize) -> impl Iterator<Item = usize> {
        (self.burn_in..iterations).step_by(self.thin.max(1))
    }
}

/// Independent chains run one after another with staggered seeds.
#[derive(Debug, Clone, Copy)]
pub struct MultiChainOptions {
    pub chains: usize,
    /// Chain `k` uses seed `config.seed + k * seed_stride`.
    pub seed_stride: u64,
}

impl Default for MultiChainOptions {
    fn default() -> Self {
        Self {
            chains: 4,
            seed_stride: 1_000,
        }
    }
}

impl MultiChainOptions {
    /// # Errors
    ///
    /// Returns `InferenceError` for fewer than two chains or a zero stride.
    pub const fn validate(self) -> Result<(), InferenceError> {
        if self.chains < 2 {
            return Err(InferenceError::InvalidChainCount {
                min: 2,
                found: self.chains,
            });
        }
        if self.seed_stride == 0 {
            return Err(InferenceError::InvalidSeedStride);
        }
        Ok(())
    }
}

/// Proposal counters for a Metropolis-Hastings chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProposalStats {
    pub proposed: usize,
    pub accepted: usize,
}

impl ProposalStats {
    /// Record one proposal and whether it was accepted.
    pub const fn record(&mut self, accepted: bool) {
        self.proposed += 1;
        if accepted {
            self.accepted += 1;
        }
    }

    /// Acceptance rate in `[0, 1]`, or `0` if no proposals were made.
    #[must_use]
    pub fn acceptance_rate(self) -> f64 {
        if self.proposed == 0 {
            0.0
        } else {
            usize_to_f64(self.accepted) / usize_to_f64(self.proposed)
        }
    }
}
