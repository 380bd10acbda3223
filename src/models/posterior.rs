//! Marginal posterior (ancestral-state) reconstruction.
//!
//! Second, top-down pass over the bottom-up probability table. The root
//! combines its table row with the root prior. Every other node `c` with
//! parent `n` gets
//!
//! `post[c, s'] = sum_s post[n, s] * T[s, s'] * Pr[c, s'] / sum_u T[s, u] * Pr[c, u]`
//!
//! where `T` is the joint transition table implied by the parent's type.

use faer::Mat;

use super::matrices::TransitionMatrix;
use super::pruning::{PrunerHandle, Regimes, root_node_prior};
use super::states::StateSpace;
use super::types::{LikelihoodError, ModelParameters, RootPrior};
use crate::input::NodeType;
use crate::tree::TreeTopology;
use crate::utils::matrix_is_finite;

/// Per-node marginal posterior probabilities.
#[derive(Debug, Clone)]
pub struct PosteriorProbabilities {
    /// `n x 2^P` probability of each latent state.
    pub states: Mat<f64>,
    /// `n x P` probability that each trait is present.
    pub traits: Mat<f64>,
}

impl PosteriorProbabilities {
    /// Posterior probability that `trait_index` is present at `node`.
    #[must_use]
    pub fn trait_probability(&self, node: usize, trait_index: usize) -> f64 {
        self.traits[(node, trait_index)]
    }
}

/// Reconstruct marginals from a stateless probability table with one gain/loss pair.
///
/// # Errors
///
/// Returns `LikelihoodError::TableShape` if `pr` is not `n x 2^P`,
/// `LikelihoodError::NonFiniteTable` if it holds NaN or infinite entries, and
/// `LikelihoodError::ZeroLikelihood` if the data are impossible under the
/// parameters.
pub fn posterior_probabilities(
    pr: &Mat<f64>,
    mu: [f64; 2],
    pi: RootPrior,
    topology: &TreeTopology,
) -> Result<PosteriorProbabilities, LikelihoodError> {
    let space = state_space_for(pr, topology)?;
    if !matrix_is_finite(pr) {
        return Err(LikelihoodError::NonFiniteTable);
    }
    let transition = TransitionMatrix::new(mu)?;
    let regimes = Regimes::new(transition, transition, &space);
    let prior = root_node_prior(pi.resolve(mu, mu, 0.0), &space);
    reconstruct(pr, topology, &space, &regimes, &prior, |_| NodeType::Speciation)
}

impl PrunerHandle {
    /// Evaluate `params` and reconstruct per-node marginals under the
    /// per-node duplication/speciation regimes.
    ///
    /// # Errors
    ///
    /// Returns `LikelihoodError` for invalid parameters or zero likelihood.
    pub fn posterior(
        &mut self,
        params: &ModelParameters,
    ) -> Result<PosteriorProbabilities, LikelihoodError> {
        self.log_likelihood(params)?;
        let pr = self.probabilities().ok_or(LikelihoodError::ZeroLikelihood)?;

        let regimes = Regimes::new(
            TransitionMatrix::new(params.mu_d)?,
            TransitionMatrix::new(params.mu_s)?,
            self.states(),
        );
        let prior = root_node_prior(self.resolve_root(params), self.states());
        let node_types = self.node_types();
        reconstruct(pr, self.topology(), self.states(), &regimes, &prior, |node| {
            node_types[node]
        })
    }
}

fn state_space_for(pr: &Mat<f64>, topology: &TreeTopology) -> Result<StateSpace, LikelihoodError> {
    let n_states = pr.ncols();
    if pr.nrows() != topology.n_nodes() || n_states < 2 || !n_states.is_power_of_two() {
        return Err(LikelihoodError::TableShape {
            rows: pr.nrows(),
            cols: n_states,
            expected_rows: topology.n_nodes(),
            expected_cols: n_states.max(2).next_power_of_two(),
        });
    }
    StateSpace::new(n_states.trailing_zeros() as usize)
}

fn reconstruct(
    pr: &Mat<f64>,
    topology: &TreeTopology,
    space: &StateSpace,
    regimes: &Regimes,
    prior: &[f64],
    node_type: impl Fn(usize) -> NodeType,
) -> Result<PosteriorProbabilities, LikelihoodError> {
    let n_states = space.n_states();
    let mut post = Mat::<f64>::zeros(topology.n_nodes(), n_states);

    let root = topology.root();
    let mut total = 0.0;
    for s in 0..n_states {
        post[(root, s)] = prior[s] * pr[(root, s)];
        total += post[(root, s)];
    }
    if !(total.is_finite() && total > 0.0) {
        return Err(LikelihoodError::ZeroLikelihood);
    }
    for s in 0..n_states {
        post[(root, s)] /= total;
    }

    let mut denominators = vec![0.0; n_states];
    for node in topology.preorder() {
        let transitions = regimes.for_type(node_type(node));
        for &child in topology.offspring(node) {
            for (s, denominator) in denominators.iter_mut().enumerate() {
                let offset = s * n_states;
                *denominator = (0..n_states)
                    .map(|u| transitions[offset + u] * pr[(child, u)])
                    .sum();
            }

            let mut child_total = 0.0;
            for s_child in 0..n_states {
                let mut mass = 0.0;
                for (s, &denominator) in denominators.iter().enumerate() {
                    if denominator > 0.0 {
                        mass += post[(node, s)] * transitions[s * n_states + s_child]
                            / denominator;
                    }
                }
                post[(child, s_child)] = mass * pr[(child, s_child)];
                child_total += post[(child, s_child)];
            }

            if child_total > 0.0 {
                for s_child in 0..n_states {
                    post[(child, s_child)] /= child_total;
                }
            }
        }
    }

    let traits = Mat::from_fn(topology.n_nodes(), space.n_traits(), |node, p| {
        (0..n_states)
            .filter(|&s| space.value(s, p) == 1)
            .map(|s| post[(node, s)])
            .sum()
    });

    Ok(PosteriorProbabilities {
        states: post,
        traits,
    })
}
