//! 2x2 measurement-error and state-transition matrices.
//!
//! Both matrices share the parameterization `[[1 - a, a], [b, 1 - b]]`
//! where `a` is the probability of moving 0 -> 1 and `b` of moving 1 -> 0,
//! but they are distinct types so a call site cannot pass one where the
//! other is expected.

use super::types::LikelihoodError;
use crate::utils::is_probability;

/// Sum of rates below which a transition pair is treated as frozen.
const RATE_EPSILON: f64 = 1.0e-10;

fn two_state(rates: [f64; 2]) -> [[f64; 2]; 2] {
    [[1.0 - rates[0], rates[0]], [rates[1], 1.0 - rates[1]]]
}

fn check_probabilities(name: &'static str, values: [f64; 2]) -> Result<(), LikelihoodError> {
    for value in values {
        if !is_probability(value) {
            return Err(LikelihoodError::InvalidProbability { name, value });
        }
    }
    Ok(())
}

/// Maps a true latent state (row) to an observed symbol (column).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ErrorMatrix([[f64; 2]; 2]);

impl ErrorMatrix {
    /// `psi[0]` is the probability of reporting 1 for a true 0,
    /// `psi[1]` of reporting 0 for a true 1.
    ///
    /// # Errors
    ///
    /// Returns `LikelihoodError::InvalidProbability` outside `[0, 1]`.
    pub fn new(psi: [f64; 2]) -> Result<Self, LikelihoodError> {
        check_probabilities("psi", psi)?;
        Ok(Self(two_state(psi)))
    }

    #[must_use]
    pub const fn get(&self, truth: usize, observed: usize) -> f64 {
        self.0[truth][observed]
    }

    #[must_use]
    pub const fn rows(&self) -> [[f64; 2]; 2] {
        self.0
    }
}

/// Maps a parent state (row) to a child state (column).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransitionMatrix([[f64; 2]; 2]);

impl TransitionMatrix {
    /// `mu[0]` is the gain probability (0 -> 1), `mu[1]` the loss probability (1 -> 0).
    ///
    /// # Errors
    ///
    /// Returns `LikelihoodError::InvalidProbability` outside `[0, 1]`.
    pub fn new(mu: [f64; 2]) -> Result<Self, LikelihoodError> {
        check_probabilities("mu", mu)?;
        Ok(Self(two_state(mu)))
    }

    #[must_use]
    pub const fn get(&self, parent: usize, child: usize) -> f64 {
        self.0[parent][child]
    }

    #[must_use]
    pub const fn rows(&self) -> [[f64; 2]; 2] {
        self.0
    }

    /// Equilibrium probability of the `1` state.
    #[must_use]
    pub fn stationary_gain(&self) -> f64 {
        stationary_gain([self.0[0][1], self.0[1][0]])
    }
}

/// Build the measurement-error matrix from `psi`.
///
/// # Errors
///
/// See [`ErrorMatrix::new`].
pub fn error_matrix(psi: [f64; 2]) -> Result<ErrorMatrix, LikelihoodError> {
    ErrorMatrix::new(psi)
}

/// Build a gain/loss transition matrix from `mu`.
///
/// # Errors
///
/// See [`TransitionMatrix::new`].
pub fn transition_matrix(mu: [f64; 2]) -> Result<TransitionMatrix, LikelihoodError> {
    TransitionMatrix::new(mu)
}

/// Stationary probability of the `1` state for a gain/loss pair.
///
/// At equilibrium `pi_0 * gain = pi_1 * loss`, so `pi_1 = gain / (gain + loss)`.
/// A frozen chain (no gain, no loss) falls back to `0.5`.
#[must_use]
pub fn stationary_gain(mu: [f64; 2]) -> f64 {
    let total = mu[0] + mu[1];
    if total < RATE_EPSILON {
        return 0.5;
    }
    mu[0] / total
}
