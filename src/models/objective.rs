//! Log-posterior objective over the packed nine-component parameter vector.
//!
//! Layout: `[psi0, psi1, mu_d0, mu_d1, mu_s0, mu_s1, eta0, eta1, pi]`. A
//! negative `pi` requests the stationary root prior.

use statrs::function::beta::ln_beta;
use tracing::trace;

use super::pruning::PrunerHandle;
use super::types::{LikelihoodError, ModelParameters, RootPrior};
use crate::inference::{Bounds, InferenceError, Objective};

pub const N_PARAMETERS: usize = 9;

pub const PARAMETER_NAMES: [&str; N_PARAMETERS] = [
    "psi0", "psi1", "mu_d0", "mu_d1", "mu_s0", "mu_s1", "eta0", "eta1", "Pi",
];

/// `Beta(alpha, beta)` prior on a probability.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BetaPrior {
    pub alpha: f64,
    pub beta: f64,
}

impl BetaPrior {
    #[must_use]
    pub const fn new(alpha: f64, beta: f64) -> Self {
        Self { alpha, beta }
    }

    #[must_use]
    pub fn is_valid(self) -> bool {
        self.alpha.is_finite() && self.beta.is_finite() && self.alpha > 0.0 && self.beta > 0.0
    }

    #[must_use]
    pub fn ln_pdf(self, value: f64) -> f64 {
        log_beta_density(value, self.alpha, self.beta)
    }
}

/// Log-density of `Beta(alpha, beta)`; `-inf` outside `[0, 1]` or for
/// invalid shapes.
#[must_use]
pub fn log_beta_density(value: f64, alpha: f64, beta: f64) -> f64 {
    let valid_shapes = alpha.is_finite() && beta.is_finite() && alpha > 0.0 && beta > 0.0;
    if !valid_shapes || !(0.0..=1.0).contains(&value) {
        return f64::NEG_INFINITY;
    }
    power_term(alpha - 1.0, value) + power_term(beta - 1.0, 1.0 - value) - ln_beta(alpha, beta)
}

// `0 * ln(0)` is taken as zero so uniform shapes stay finite at the edges.
fn power_term(exponent: f64, base: f64) -> f64 {
    if exponent == 0.0 { 0.0 } else { exponent * base.ln() }
}

/// Optional Beta priors per parameter group; `None` is a flat prior.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PriorConfig {
    pub psi: Option<BetaPrior>,
    pub mu_d: Option<BetaPrior>,
    pub mu_s: Option<BetaPrior>,
    pub eta: Option<BetaPrior>,
    /// Applied only when the root prior is fixed.
    pub pi: Option<BetaPrior>,
}

impl PriorConfig {
    /// The same prior on every group.
    #[must_use]
    pub const fn shared(prior: BetaPrior) -> Self {
        Self {
            psi: Some(prior),
            mu_d: Some(prior),
            mu_s: Some(prior),
            eta: Some(prior),
            pi: Some(prior),
        }
    }

    /// # Errors
    ///
    /// Returns `LikelihoodError::InvalidPrior` for non-positive or
    /// non-finite shapes.
    pub fn validate(&self) -> Result<(), LikelihoodError> {
        for (name, prior) in self.groups() {
            if let Some(prior) = prior.filter(|prior| !prior.is_valid()) {
                return Err(LikelihoodError::InvalidPrior {
                    name,
                    alpha: prior.alpha,
                    beta: prior.beta,
                });
            }
        }
        Ok(())
    }

    /// Joint log prior density of `params`.
    #[must_use]
    pub fn log_density(&self, params: &ModelParameters) -> f64 {
        let pair = |prior: Option<BetaPrior>, values: [f64; 2]| {
            prior.map_or(0.0, |prior| prior.ln_pdf(values[0]) + prior.ln_pdf(values[1]))
        };
        let root = match (self.pi, params.root) {
            (Some(prior), RootPrior::Fixed(pi)) => prior.ln_pdf(pi),
            _ => 0.0,
        };
        pair(self.psi, params.psi)
            + pair(self.mu_d, params.mu_d)
            + pair(self.mu_s, params.mu_s)
            + pair(self.eta, params.eta)
            + root
    }

    const fn groups(&self) -> [(&'static str, Option<BetaPrior>); 5] {
        [
            ("psi", self.psi),
            ("mu_d", self.mu_d),
            ("mu_s", self.mu_s),
            ("eta", self.eta),
            ("Pi", self.pi),
        ]
    }
}

/// Sampler target that evaluates the log posterior through a persistent handle.
#[derive(Debug, Clone)]
pub struct PhyloObjective {
    handle: PrunerHandle,
    priors: PriorConfig,
}

impl PhyloObjective {
    /// # Errors
    ///
    /// Returns `LikelihoodError::InvalidPrior` for invalid prior shapes.
    pub fn new(handle: PrunerHandle, priors: PriorConfig) -> Result<Self, LikelihoodError> {
        priors.validate()?;
        Ok(Self { handle, priors })
    }

    /// Objective with flat priors, i.e. the plain log-likelihood.
    #[must_use]
    pub fn flat(handle: PrunerHandle) -> Self {
        Self {
            handle,
            priors: PriorConfig::default(),
        }
    }

    /// Unpack a parameter vector.
    ///
    /// # Errors
    ///
    /// Returns `LikelihoodError::ParameterLength` unless `theta` has nine components.
    pub fn parameters(theta: &[f64]) -> Result<ModelParameters, LikelihoodError> {
        let &[psi0, psi1, mu_d0, mu_d1, mu_s0, mu_s1, eta0, eta1, pi] = theta else {
            return Err(LikelihoodError::ParameterLength {
                name: "par",
                expected: N_PARAMETERS,
                found: theta.len(),
            });
        };
        Ok(ModelParameters {
            psi: [psi0, psi1],
            mu_d: [mu_d0, mu_d1],
            mu_s: [mu_s0, mu_s1],
            eta: [eta0, eta1],
            root: RootPrior::from_raw(pi),
        })
    }

    /// Pack `params`; the stationary root prior becomes `-1`.
    #[must_use]
    pub const fn pack(params: &ModelParameters) -> [f64; N_PARAMETERS] {
        let pi = match params.root {
            RootPrior::Fixed(pi) => pi,
            RootPrior::Stationary => -1.0,
        };
        [
            params.psi[0],
            params.psi[1],
            params.mu_d[0],
            params.mu_d[1],
            params.mu_s[0],
            params.mu_s[1],
            params.eta[0],
            params.eta[1],
            pi,
        ]
    }

    /// `[0, 1]` for every component.
    ///
    /// # Errors
    ///
    /// Never fails in practice; the signature mirrors [`Bounds::unit`].
    pub fn default_bounds() -> Result<Bounds, InferenceError> {
        Bounds::unit(N_PARAMETERS)
    }

    /// Log-likelihood plus log prior at `theta`.
    ///
    /// # Errors
    ///
    /// Returns `LikelihoodError` for a malformed vector or invalid probabilities.
    pub fn log_posterior(&mut self, theta: &[f64]) -> Result<f64, LikelihoodError> {
        let params = Self::parameters(theta)?;
        let log_likelihood = self.handle.log_likelihood(&params)?;
        Ok(log_likelihood + self.priors.log_density(&params))
    }

    #[must_use]
    pub const fn handle(&self) -> &PrunerHandle {
        &self.handle
    }

    pub const fn handle_mut(&mut self) -> &mut PrunerHandle {
        &mut self.handle
    }

    #[must_use]
    pub fn into_handle(self) -> PrunerHandle {
        self.handle
    }

    #[must_use]
    pub const fn priors(&self) -> &PriorConfig {
        &self.priors
    }
}

impl Objective for PhyloObjective {
    fn evaluate(&mut self, theta: &[f64]) -> f64 {
        match self.log_posterior(theta) {
            Ok(value) => value,
            Err(error) => {
                trace!(%error, "parameter vector outside the model support");
                f64::NEG_INFINITY
            }
        }
    }

    fn dimension(&self) -> Option<usize> {
        Some(N_PARAMETERS)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::inference::{ChainConfig, run_chain};
    use crate::input::{AnnotationMatrix, NodeType};
    use crate::tree::TreeTopology;

    fn handle() -> PrunerHandle {
        let topology =
            TreeTopology::from_edges(&[(0, 1), (0, 2), (1, 3), (1, 4)], 5).expect("valid tree");
        let annotations = AnnotationMatrix::from_codes(&[
            vec![9],
            vec![9],
            vec![1],
            vec![0],
            vec![1],
        ])
        .expect("valid codes");
        PrunerHandle::new(
            topology,
            annotations,
            vec![
                NodeType::Duplication,
                NodeType::Speciation,
                NodeType::Speciation,
                NodeType::Speciation,
                NodeType::Speciation,
            ],
        )
        .expect("valid handle")
    }

    const THETA: [f64; N_PARAMETERS] = [0.05, 0.1, 0.3, 0.2, 0.1, 0.05, 0.9, 0.95, 0.4];

    #[test]
    fn unpacks_vector_and_stationary_sentinel() {
        let params = PhyloObjective::parameters(&THETA).expect("nine components");
        assert_eq!(params.mu_d, [0.3, 0.2]);
        assert_eq!(params.root, RootPrior::Fixed(0.4));

        let mut stationary = THETA;
        stationary[8] = -1.0;
        let params = PhyloObjective::parameters(&stationary).expect("nine components");
        assert_eq!(params.root, RootPrior::Stationary);
        assert_eq!(PhyloObjective::pack(&params), stationary);

        assert!(matches!(
            PhyloObjective::parameters(&THETA[..8]),
            Err(LikelihoodError::ParameterLength { found: 8, .. })
        ));
    }

    #[test]
    fn flat_objective_is_the_log_likelihood() {
        let mut objective = PhyloObjective::flat(handle());
        let params = PhyloObjective::parameters(&THETA).expect("valid");
        let expected = handle().log_likelihood(&params).expect("valid");
        assert_relative_eq!(objective.evaluate(&THETA), expected, epsilon = 1.0e-12);
    }

    #[test]
    fn beta_prior_adds_log_density() {
        assert_relative_eq!(log_beta_density(0.5, 2.0, 2.0), 1.5f64.ln(), epsilon = 1.0e-12);
        assert_relative_eq!(log_beta_density(0.0, 1.0, 1.0), 0.0, epsilon = 1.0e-12);
        assert_eq!(log_beta_density(1.5, 2.0, 2.0), f64::NEG_INFINITY);

        let prior = BetaPrior::new(2.0, 2.0);
        let mut flat = PhyloObjective::flat(handle());
        let mut informed =
            PhyloObjective::new(handle(), PriorConfig::shared(prior)).expect("valid");
        let expected: f64 = THETA.iter().map(|&value| prior.ln_pdf(value)).sum();
        assert_relative_eq!(
            informed.evaluate(&THETA) - flat.evaluate(&THETA),
            expected,
            epsilon = 1.0e-10
        );
    }

    #[test]
    fn stationary_root_skips_pi_prior() {
        let mut theta = THETA;
        theta[8] = -1.0;
        let priors = PriorConfig {
            pi: Some(BetaPrior::new(5.0, 5.0)),
            ..PriorConfig::default()
        };
        let mut informed = PhyloObjective::new(handle(), priors).expect("valid");
        let mut flat = PhyloObjective::flat(handle());
        assert_relative_eq!(informed.evaluate(&theta), flat.evaluate(&theta), epsilon = 1.0e-12);
    }

    #[test]
    fn invalid_vectors_have_zero_density() {
        let mut objective = PhyloObjective::flat(handle());
        let mut theta = THETA;
        theta[0] = 1.2;
        assert_eq!(objective.evaluate(&theta), f64::NEG_INFINITY);
        assert_eq!(objective.evaluate(&THETA[..3]), f64::NEG_INFINITY);
    }

    #[test]
    fn rejects_invalid_prior_shapes() {
        let priors = PriorConfig {
            eta: Some(BetaPrior::new(0.0, 1.0)),
            ..PriorConfig::default()
        };
        assert!(matches!(
            PhyloObjective::new(handle(), priors),
            Err(LikelihoodError::InvalidPrior { name: "eta", .. })
        ));
    }

    #[test]
    fn default_bounds_cover_unit_box() {
        let bounds = PhyloObjective::default_bounds().expect("nine components");
        assert_eq!(bounds.dimension(), N_PARAMETERS);
        assert!(bounds.contains(&THETA));
    }

    #[test]
    fn short_theta0_is_a_dimension_error_not_an_undefined_objective() {
        let mut objective = PhyloObjective::flat(handle());
        let bounds = Bounds::unit(N_PARAMETERS - 1).expect("valid");
        let err = run_chain(
            &mut objective,
            &THETA[..N_PARAMETERS - 1],
            &bounds,
            ChainConfig::default(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            InferenceError::ObjectiveDimension {
                expected: N_PARAMETERS,
                found: N_PARAMETERS - 1
            }
        );
    }
}
