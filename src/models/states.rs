//! Enumeration of the latent trait-state space.

use faer::Mat;

use super::types::LikelihoodError;

/// Largest supported trait count.
///
/// Each node-type regime holds a dense `2^P x 2^P` joint transition table
/// and pruning visits every entry per edge, so `P = 10` already means two
/// 8 MiB tables and about a million products per edge.
pub const MAX_TRAITS: usize = 10;

/// All `2^P` binary trait vectors in binary-counting order.
///
/// State `s` carries trait `p` in bit `p`, so state `0` is all zeros and the
/// last state is all ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateSpace {
    n_traits: usize,
}

impl StateSpace {
    /// # Errors
    ///
    /// Returns `LikelihoodError::NoTraits` for `n_traits == 0` and
    /// `LikelihoodError::TooManyTraits` above [`MAX_TRAITS`].
    pub const fn new(n_traits: usize) -> Result<Self, LikelihoodError> {
        if n_traits == 0 {
            return Err(LikelihoodError::NoTraits);
        }
        if n_traits > MAX_TRAITS {
            return Err(LikelihoodError::TooManyTraits {
                found: n_traits,
                max: MAX_TRAITS,
            });
        }
        Ok(Self { n_traits })
    }

    #[must_use]
    pub const fn n_traits(&self) -> usize {
        self.n_traits
    }

    #[must_use]
    pub const fn n_states(&self) -> usize {
        1 << self.n_traits
    }

    /// Coordinate `trait_index` of `state`, as `0` or `1`.
    #[must_use]
    pub const fn value(&self, state: usize, trait_index: usize) -> usize {
        (state >> trait_index) & 1
    }

    /// Binary vector of one state.
    #[must_use]
    pub fn state(&self, state: usize) -> Vec<u8> {
        (0..self.n_traits)
            .map(|p| u8::from(self.value(state, p) == 1))
            .collect()
    }

    /// The full `2^P x P` state matrix.
    #[must_use]
    pub fn to_matrix(&self) -> Mat<f64> {
        Mat::from_fn(self.n_states(), self.n_traits, |s, p| {
            if self.value(s, p) == 1 { 1.0 } else { 0.0 }
        })
    }
}

/// Enumerate the `2^P x P` state matrix for `n_traits` traits.
///
/// # Errors
///
/// Returns `LikelihoodError` when `n_traits` is zero or too large.
pub fn enumerate_states(n_traits: usize) -> Result<Mat<f64>, LikelihoodError> {
    StateSpace::new(n_traits).map(|space| space.to_matrix())
}
