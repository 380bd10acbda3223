//! Core public types for the likelihood engine.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use faer::Mat;
use thiserror::Error;

use super::matrices::stationary_gain;
use crate::input::InputError;
use crate::tree::TreeError;
use crate::utils::is_probability;

/// Errors returned by likelihood evaluation and posterior reconstruction.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LikelihoodError {
    #[error(transparent)]
    InvalidInput(#[from] InputError),
    #[error(transparent)]
    InvalidTree(#[from] TreeError),
    #[error("at least one trait is required")]
    NoTraits,
    #[error("{found} traits requested; at most {max} are supported")]
    TooManyTraits { found: usize, max: usize },
    #[error("-{name}- must be a vector of size {expected}; found {found}")]
    ParameterLength {
        name: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("-{name}- must lie in [0, 1]; found {value}")]
    InvalidProbability { name: &'static str, value: f64 },
    #[error("annotation rows ({annotations}) must match tree nodes ({nodes})")]
    AnnotationRows { annotations: usize, nodes: usize },
    #[error("check the size of the inputs: {failed} dimension check(s) failed")]
    DimensionCheckFailed { failed: usize },
    #[error("probability table is {rows}x{cols}; expected {expected_rows}x{expected_cols}")]
    TableShape {
        rows: usize,
        cols: usize,
        expected_rows: usize,
        expected_cols: usize,
    },
    #[error("probability table contains non-finite entries")]
    NonFiniteTable,
    #[error("data have zero likelihood under the supplied parameters")]
    ZeroLikelihood,
    #[error("Beta prior on -{name}- needs positive finite shapes; found ({alpha}, {beta})")]
    InvalidPrior {
        name: &'static str,
        alpha: f64,
        beta: f64,
    },
}

/// Root-state prior.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum RootPrior {
    /// Probability of the `1` state for every trait at the root.
    Fixed(f64),
    /// Derive the probability from the stationary distributions of the
    /// transition matrices, mixed by the share of duplication nodes.
    #[default]
    Stationary,
}

impl RootPrior {
    /// Interpret a raw scalar where any negative value requests the stationary prior.
    #[must_use]
    pub fn from_raw(pi: f64) -> Self {
        if pi < 0.0 { Self::Stationary } else { Self::Fixed(pi) }
    }

    /// Resolve to a scalar probability of the `1` state.
    #[must_use]
    pub fn resolve(self, mu_d: [f64; 2], mu_s: [f64; 2], duplication_share: f64) -> f64 {
        match self {
            Self::Fixed(pi) => pi,
            Self::Stationary => (1.0 - duplication_share)
                .mul_add(stationary_gain(mu_s), duplication_share * stationary_gain(mu_d)),
        }
    }

    const fn bits(self) -> u64 {
        match self {
            Self::Fixed(pi) => pi.to_bits(),
            Self::Stationary => u64::MAX,
        }
    }
}

/// Immutable snapshot of every model parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelParameters {
    /// Measurement-error rates: `psi[0]` false positive, `psi[1]` false negative.
    pub psi: [f64; 2],
    /// Gain/loss probabilities below duplication nodes.
    pub mu_d: [f64; 2],
    /// Gain/loss probabilities below speciation nodes.
    pub mu_s: [f64; 2],
    /// Annotation bias: probability of reporting an observed 0 / 1.
    pub eta: [f64; 2],
    pub root: RootPrior,
}

impl Default for ModelParameters {
    fn default() -> Self {
        Self {
            psi: [0.05, 0.05],
            mu_d: [0.1, 0.1],
            mu_s: [0.05, 0.05],
            eta: [1.0, 1.0],
            root: RootPrior::Stationary,
        }
    }
}

impl ModelParameters {
    /// Parameters with one gain/loss pair shared by both node types.
    #[must_use]
    pub const fn with_shared_mu(
        psi: [f64; 2],
        mu: [f64; 2],
        eta: [f64; 2],
        root: RootPrior,
    ) -> Self {
        Self {
            psi,
            mu_d: mu,
            mu_s: mu,
            eta,
            root,
        }
    }

    /// # Errors
    ///
    /// Returns `LikelihoodError::InvalidProbability` for any value outside `[0, 1]`.
    pub fn validate(&self) -> Result<(), LikelihoodError> {
        let groups: [(&'static str, [f64; 2]); 4] = [
            ("psi", self.psi),
            ("mu_d", self.mu_d),
            ("mu_s", self.mu_s),
            ("eta", self.eta),
        ];
        for (name, values) in groups {
            for value in values {
                if !is_probability(value) {
                    return Err(LikelihoodError::InvalidProbability { name, value });
                }
            }
        }
        if let RootPrior::Fixed(value) = self.root {
            if !is_probability(value) {
                return Err(LikelihoodError::InvalidProbability { name: "Pi", value });
            }
        }
        Ok(())
    }

    /// Bit patterns of every parameter; equal only for bit-identical snapshots.
    #[must_use]
    pub const fn bits(&self) -> [u64; 9] {
        [
            self.psi[0].to_bits(),
            self.psi[1].to_bits(),
            self.mu_d[0].to_bits(),
            self.mu_d[1].to_bits(),
            self.mu_s[0].to_bits(),
            self.mu_s[1].to_bits(),
            self.eta[0].to_bits(),
            self.eta[1].to_bits(),
            self.root.bits(),
        ]
    }

    /// Hash of [`Self::bits`], used as the evaluation cache key.
    #[must_use]
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.bits().hash(&mut hasher);
        hasher.finish()
    }
}

/// Result of a stateless likelihood evaluation.
#[derive(Debug, Clone)]
pub struct Likelihood {
    pub log_likelihood: f64,
    /// `2^P x P` state matrix, present in verbose mode.
    pub states: Option<Mat<f64>>,
    /// `n x 2^P` bottom-up probability table, present in verbose mode.
    pub probabilities: Option<Mat<f64>>,
}

/// Result of an evaluation through a persistent handle.
#[derive(Debug, Clone)]
pub struct HandleEvaluation {
    /// Snapshot version this result is bound to.
    pub version: u64,
    pub log_likelihood: f64,
    /// `n x 2^P` bottom-up probability table, present in verbose mode.
    pub probabilities: Option<Mat<f64>>,
}
