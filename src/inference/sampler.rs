//! Metropolis-Hastings chains driven by a caller-supplied log objective.

use faer::Mat;
use rand::rngs::StdRng;
use rand::{RngExt, SeedableRng};
use tracing::{debug, trace};

use super::proposal::{Bounds, reflected_proposal};
use super::{
    ChainConfig, InferenceError, MultiChainOptions, ProposalStats, SamplerKind, SummaryOptions,
};
use crate::utils::{column_values, row_values};

/// Log-density target evaluated at a parameter vector.
///
/// Any `FnMut(&[f64]) -> f64` closure is an objective. The starting value
/// must be finite. After that only `NaN` aborts the chain: a move to `-inf`
/// is always rejected and a chain sitting at `+inf` never leaves it.
pub trait Objective {
    fn evaluate(&mut self, theta: &[f64]) -> f64;

    /// Length of `theta` this objective accepts, if it fixes one.
    fn dimension(&self) -> Option<usize> {
        None
    }
}

impl<F> Objective for F
where
    F: FnMut(&[f64]) -> f64,
{
    fn evaluate(&mut self, theta: &[f64]) -> f64 {
        self(theta)
    }
}

/// Output of one chain.
#[derive(Debug, Clone)]
pub struct Chain {
    /// `iterations x K`; row `i` is the current vector after iteration `i`.
    pub draws: Mat<f64>,
    pub acceptance: ProposalStats,
    /// Objective value at the final row.
    pub final_value: f64,
    /// Seed the chain was started from; `None` when the caller supplied the RNG.
    pub seed: Option<u64>,
}

impl Chain {
    #[must_use]
    pub fn iterations(&self) -> usize {
        self.draws.nrows()
    }

    #[must_use]
    pub fn dimension(&self) -> usize {
        self.draws.ncols()
    }

    /// Row `iteration` as a vector.
    #[must_use]
    pub fn draw(&self, iteration: usize) -> Vec<f64> {
        row_values(&self.draws, iteration)
    }

    /// Full trace of parameter `index`.
    #[must_use]
    pub fn trace(&self, index: usize) -> Vec<f64> {
        column_values(&self.draws, index)
    }

    /// Trace of parameter `index` after burn-in and thinning.
    #[must_use]
    pub fn retained_trace(&self, index: usize, options: SummaryOptions) -> Vec<f64> {
        options
            .retained(self.iterations())
            .map(|row| self.draws[(row, index)])
            .collect()
    }

    #[must_use]
    pub fn acceptance_rate(&self) -> f64 {
        self.acceptance.acceptance_rate()
    }
}

/// Run one seeded chain from `theta0`.
///
/// # Errors
///
/// Returns `InferenceError` for an invalid configuration, a `theta0`
/// outside `bounds` or of the wrong length for the objective, an objective
/// that is not finite at `theta0`, or one that is `NaN` at any proposal.
pub fn run_chain<O>(
    objective: &mut O,
    theta0: &[f64],
    bounds: &Bounds,
    config: ChainConfig,
) -> Result<Chain, InferenceError>
where
    O: Objective + ?Sized,
{
    config.validate()?;
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut chain = run_chain_with_rng(
        objective,
        theta0,
        bounds,
        config.iterations,
        config.scale,
        config.kind,
        &mut rng,
    )?;
    chain.seed = Some(config.seed);
    Ok(chain)
}

/// Run one chain drawing randomness from `rng`.
///
/// Every iteration appends the current vector as a row whether or not
/// the proposal was accepted.
///
/// # Errors
///
/// Returns `InferenceError` as described for [`run_chain`].
pub fn run_chain_with_rng<O>(
    objective: &mut O,
    theta0: &[f64],
    bounds: &Bounds,
    iterations: usize,
    scale: f64,
    kind: SamplerKind,
    rng: &mut StdRng,
) -> Result<Chain, InferenceError>
where
    O: Objective + ?Sized,
{
    if iterations == 0 {
        return Err(InferenceError::InvalidIterations);
    }
    if !(scale.is_finite() && scale > 0.0) {
        return Err(InferenceError::InvalidScale(scale));
    }
    bounds.check(theta0)?;
    check_objective_dimension(objective, theta0)?;

    let mut current = theta0.to_vec();
    let mut current_value = initial_value(objective, &current)?;

    debug!(
        iterations,
        dimension = current.len(),
        scale,
        ?kind,
        initial = current_value,
        "starting chain"
    );

    let mut draws = Mat::<f64>::zeros(iterations, current.len());
    let mut acceptance = ProposalStats::default();

    for iteration in 0..iterations {
        match kind {
            SamplerKind::Joint => {
                let proposal = reflected_proposal(&current, bounds, scale, rng)?;
                let proposal_value = checked_value(objective, &proposal, iteration)?;
                let accepted = accept(proposal_value - current_value, rng);
                acceptance.record(accepted);
                if accepted {
                    current = proposal;
                    current_value = proposal_value;
                }
            }
            SamplerKind::Componentwise => {
                current_value = componentwise_update(
                    objective,
                    &mut current,
                    current_value,
                    bounds,
                    scale,
                    rng,
                    &mut acceptance,
                    iteration,
                )?;
            }
        }

        for (k, value) in current.iter().enumerate() {
            draws[(iteration, k)] = *value;
        }
        trace!(iteration, value = current_value, "chain step");
    }

    debug!(
        acceptance_rate = acceptance.acceptance_rate(),
        final_value = current_value,
        "chain finished"
    );

    Ok(Chain {
        draws,
        acceptance,
        final_value: current_value,
        seed: None,
    })
}

/// One Metropolis-within-Gibbs sweep sharing a single reflected proposal.
///
/// Component `k` of the proposal is swapped into the current vector and
/// kept if `exp(f(candidate) - f(current)) > u`; otherwise the current
/// value is restored before moving to `k + 1`.
///
/// # Errors
///
/// Returns `InferenceError` for an invalid scale, a dimension mismatch,
/// an objective that is not finite at `x`, or one that is `NaN` at any
/// candidate.
pub fn componentwise_step<O>(
    objective: &mut O,
    x: &[f64],
    bounds: &Bounds,
    scale: f64,
    rng: &mut StdRng,
) -> Result<Vec<f64>, InferenceError>
where
    O: Objective + ?Sized,
{
    bounds.check(x)?;
    check_objective_dimension(objective, x)?;
    let mut current = x.to_vec();
    let value = initial_value(objective, &current)?;
    let mut stats = ProposalStats::default();
    componentwise_update(objective, &mut current, value, bounds, scale, rng, &mut stats, 0)?;
    Ok(current)
}

#[allow(clippy::too_many_arguments)]
fn componentwise_update<O>(
    objective: &mut O,
    current: &mut [f64],
    mut current_value: f64,
    bounds: &Bounds,
    scale: f64,
    rng: &mut StdRng,
    stats: &mut ProposalStats,
    iteration: usize,
) -> Result<f64, InferenceError>
where
    O: Objective + ?Sized,
{
    let proposal = reflected_proposal(current, bounds, scale, rng)?;
    for (k, candidate) in proposal.into_iter().enumerate() {
        let previous = current[k];
        current[k] = candidate;
        let candidate_value = checked_value(objective, current, iteration)?;
        let accepted = accept(candidate_value - current_value, rng);
        stats.record(accepted);
        if accepted {
            current_value = candidate_value;
        } else {
            current[k] = previous;
        }
    }
    Ok(current_value)
}

/// Run `options.chains` independent chains with seeds spaced by the stride.
///
/// # Errors
///
/// Returns `InferenceError` for invalid options or the first failing chain.
pub fn run_chains<O>(
    objective: &mut O,
    theta0: &[f64],
    bounds: &Bounds,
    config: ChainConfig,
    options: MultiChainOptions,
) -> Result<Vec<Chain>, InferenceError>
where
    O: Objective + ?Sized,
{
    options.validate()?;
    config.validate()?;

    let mut chains = Vec::with_capacity(options.chains);
    let mut seed = config.seed;
    for index in 0..options.chains {
        debug!(chain = index, seed, "running chain");
        let chain = run_chain(objective, theta0, bounds, ChainConfig { seed, ..config })?;
        chains.push(chain);
        seed = seed.wrapping_add(options.seed_stride);
    }
    Ok(chains)
}

fn check_objective_dimension<O>(objective: &O, theta: &[f64]) -> Result<(), InferenceError>
where
    O: Objective + ?Sized,
{
    match objective.dimension() {
        Some(expected) if expected != theta.len() => Err(InferenceError::ObjectiveDimension {
            expected,
            found: theta.len(),
        }),
        _ => Ok(()),
    }
}

fn initial_value<O>(objective: &mut O, theta: &[f64]) -> Result<f64, InferenceError>
where
    O: Objective + ?Sized,
{
    let value = objective.evaluate(theta);
    if !value.is_finite() {
        return Err(InferenceError::UndefinedObjective {
            iteration: None,
            value,
        });
    }
    Ok(value)
}

fn checked_value<O>(
    objective: &mut O,
    theta: &[f64],
    iteration: usize,
) -> Result<f64, InferenceError>
where
    O: Objective + ?Sized,
{
    let value = objective.evaluate(theta);
    if value.is_nan() {
        return Err(InferenceError::UndefinedObjective {
            iteration: Some(iteration),
            value,
        });
    }
    Ok(value)
}

/// Metropolis rule. A `NaN` ratio (`inf - inf`) rejects.
fn accept(log_ratio: f64, rng: &mut StdRng) -> bool {
    let u = rng.random::<f64>();
    log_ratio >= 0.0 || u < log_ratio.exp()
}
