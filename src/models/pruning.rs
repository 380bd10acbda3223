//! Pruning (peeling) likelihood for annotated trees.
//!
//! Computes `Pr[node, state] = P(data below node | node in state)` in
//! postorder and aggregates the root row against the root prior:
//!
//! 1. Leaves: product over traits of the measurement-error and
//!    annotation-bias terms for the observed symbol (or the missing-data
//!    mixture when unobserved).
//! 2. Internal nodes: `Pr[n, s] = prod_c sum_s' T_type(n)[s, s'] * Pr[c, s']`
//!    where `T` multiplies the per-trait 2x2 transition entries and the
//!    matrix is chosen by the node's duplication/speciation type.
//! 3. Root: `ll = log(sum_s prior[s] * Pr[root, s])`.

use faer::Mat;
use tracing::{debug, warn};

use super::matrices::{ErrorMatrix, TransitionMatrix};
use super::states::StateSpace;
use super::types::{HandleEvaluation, Likelihood, LikelihoodError, ModelParameters, RootPrior};
use crate::input::{Annotation, AnnotationMatrix, InputError, NodeType};
use crate::tree::TreeTopology;
use crate::utils::usize_to_f64;

/// Options for the stateless evaluation.
#[derive(Debug, Clone, Copy)]
pub struct EvaluationOptions {
    /// Return the state matrix and the full probability table.
    pub verbose: bool,
    /// Check input dimensions before computing.
    pub check_dims: bool,
}

impl Default for EvaluationOptions {
    fn default() -> Self {
        Self {
            verbose: false,
            check_dims: true,
        }
    }
}

/// Root prior over all states: `prod_p (pi if S(s, p) = 1 else 1 - pi)`.
#[must_use]
pub fn root_node_prior(pi: f64, space: &StateSpace) -> Vec<f64> {
    (0..space.n_states())
        .map(|s| {
            (0..space.n_traits())
                .map(|p| if space.value(s, p) == 1 { pi } else { 1.0 - pi })
                .product()
        })
        .collect()
}

/// Row-major `2^P x 2^P` matrix of joint transition probabilities between states.
pub(crate) fn state_transitions(matrix: &TransitionMatrix, space: &StateSpace) -> Vec<f64> {
    let n_states = space.n_states();
    let mut products = vec![1.0; n_states * n_states];
    for parent in 0..n_states {
        for child in 0..n_states {
            products[parent * n_states + child] = (0..space.n_traits())
                .map(|p| matrix.get(space.value(parent, p), space.value(child, p)))
                .product();
        }
    }
    products
}

/// Joint state-transition tables for both node types.
pub(crate) struct Regimes {
    duplication: Vec<f64>,
    speciation: Vec<f64>,
}

impl Regimes {
    pub(crate) fn new(
        mu_d: TransitionMatrix,
        mu_s: TransitionMatrix,
        space: &StateSpace,
    ) -> Self {
        Self {
            duplication: state_transitions(&mu_d, space),
            speciation: state_transitions(&mu_s, space),
        }
    }

    pub(crate) fn for_type(&self, node_type: NodeType) -> &[f64] {
        match node_type {
            NodeType::Duplication => &self.duplication,
            NodeType::Speciation => &self.speciation,
        }
    }
}

fn leaf_probability(
    row: &[Annotation],
    state: usize,
    space: &StateSpace,
    error: &ErrorMatrix,
    eta: [f64; 2],
) -> f64 {
    row.iter()
        .enumerate()
        .map(|(p, annotation)| {
            let truth = space.value(state, p);
            match annotation.observed() {
                Some(symbol) => error.get(truth, symbol) * eta[symbol],
                None => (1.0 - eta[0]).mul_add(
                    error.get(truth, 0),
                    (1.0 - eta[1]) * error.get(truth, 1),
                ),
            }
        })
        .product()
}

/// Fill the bottom-up probability table in postorder.
pub(crate) fn prune(
    topology: &TreeTopology,
    annotations: &AnnotationMatrix,
    space: &StateSpace,
    error: &ErrorMatrix,
    eta: [f64; 2],
    regimes: &Regimes,
    node_type: impl Fn(usize) -> NodeType,
) -> Mat<f64> {
    let n_states = space.n_states();
    let mut pr = Mat::<f64>::zeros(topology.n_nodes(), n_states);

    for &node in topology.postorder() {
        if topology.is_leaf(node) {
            let row = annotations.row(node);
            for s in 0..n_states {
                pr[(node, s)] = leaf_probability(row, s, space, error, eta);
            }
            continue;
        }

        let transitions = regimes.for_type(node_type(node));
        for s in 0..n_states {
            let mut joint = 1.0;
            for &child in topology.offspring(node) {
                let offset = s * n_states;
                let mut child_likelihood = 0.0;
                for s_child in 0..n_states {
                    child_likelihood += transitions[offset + s_child] * pr[(child, s_child)];
                }
                joint *= child_likelihood;
            }
            pr[(node, s)] = joint;
        }
    }

    pr
}

/// `log(sum_s prior[s] * Pr[root, s])`.
pub(crate) fn root_log_likelihood(pr: &Mat<f64>, root: usize, prior: &[f64]) -> f64 {
    prior
        .iter()
        .enumerate()
        .map(|(s, weight)| weight * pr[(root, s)])
        .sum::<f64>()
        .ln()
}

fn pair(name: &'static str, values: &[f64]) -> Result<[f64; 2], LikelihoodError> {
    <[f64; 2]>::try_from(values).map_err(|_| LikelihoodError::ParameterLength {
        name,
        expected: 2,
        found: values.len(),
    })
}

fn check_dimensions(
    annotations: &AnnotationMatrix,
    topology: &TreeTopology,
    psi: &[f64],
    mu: &[f64],
    eta: &[f64],
) -> Result<(), LikelihoodError> {
    let mut failed = 0usize;

    if annotations.n_nodes() != topology.n_nodes() {
        warn!(
            annotations = annotations.n_nodes(),
            offspring = topology.n_nodes(),
            "-annotations- and -offspring- have different lengths"
        );
        failed += 1;
    }
    for (name, values) in [("psi", psi), ("mu", mu), ("eta", eta)] {
        if values.len() != 2 {
            warn!(parameter = name, found = values.len(), "parameter must be a vector of size 2");
            failed += 1;
        }
    }

    if failed > 0 {
        return Err(LikelihoodError::DimensionCheckFailed { failed });
    }
    Ok(())
}

/// Stateless likelihood evaluation with one gain/loss pair for every node.
///
/// # Errors
///
/// Returns `LikelihoodError::DimensionCheckFailed` when `options.check_dims`
/// is set and any check fails (each failure is logged first), and other
/// `LikelihoodError` variants for wrong lengths or invalid probabilities.
pub fn evaluate_likelihood(
    annotations: &AnnotationMatrix,
    topology: &TreeTopology,
    psi: &[f64],
    mu: &[f64],
    eta: &[f64],
    pi: RootPrior,
    options: EvaluationOptions,
) -> Result<Likelihood, LikelihoodError> {
    if options.check_dims {
        check_dimensions(annotations, topology, psi, mu, eta)?;
    }
    if annotations.n_nodes() != topology.n_nodes() {
        return Err(LikelihoodError::AnnotationRows {
            annotations: annotations.n_nodes(),
            nodes: topology.n_nodes(),
        });
    }

    let mu = pair("mu", mu)?;
    let params = ModelParameters::with_shared_mu(pair("psi", psi)?, mu, pair("eta", eta)?, pi);
    params.validate()?;

    let space = StateSpace::new(annotations.n_traits())?;
    let error = ErrorMatrix::new(params.psi)?;
    let transition = TransitionMatrix::new(mu)?;
    let regimes = Regimes::new(transition, transition, &space);

    let pr = prune(topology, annotations, &space, &error, params.eta, &regimes, |_| {
        NodeType::Speciation
    });
    let prior = root_node_prior(pi.resolve(mu, mu, 0.0), &space);
    let log_likelihood = root_log_likelihood(&pr, topology.root(), &prior);

    Ok(if options.verbose {
        Likelihood {
            log_likelihood,
            states: Some(space.to_matrix()),
            probabilities: Some(pr),
        }
    } else {
        Likelihood {
            log_likelihood,
            states: None,
            probabilities: None,
        }
    })
}

#[derive(Debug, Clone)]
struct CachedEvaluation {
    key: u64,
    bits: [u64; 9],
    version: u64,
    log_likelihood: f64,
    probabilities: Mat<f64>,
}

/// Persistent tree handle for repeated evaluations with a fixed topology.
///
/// The handle owns its cache, so evaluations need `&mut self`; callers
/// sharing a handle across threads must serialize access or hold one
/// handle each.
#[derive(Debug, Clone)]
pub struct PrunerHandle {
    topology: TreeTopology,
    annotations: AnnotationMatrix,
    node_types: Vec<NodeType>,
    space: StateSpace,
    n_annotated: usize,
    duplication_share: f64,
    next_version: u64,
    cache: Option<CachedEvaluation>,
}

impl PrunerHandle {
    /// # Errors
    ///
    /// Returns `LikelihoodError` if annotations or node types do not cover
    /// every node, or the trait count is unsupported.
    pub fn new(
        topology: TreeTopology,
        annotations: AnnotationMatrix,
        node_types: Vec<NodeType>,
    ) -> Result<Self, LikelihoodError> {
        if annotations.n_nodes() != topology.n_nodes() {
            return Err(LikelihoodError::AnnotationRows {
                annotations: annotations.n_nodes(),
                nodes: topology.n_nodes(),
            });
        }
        if node_types.len() != topology.n_nodes() {
            return Err(InputError::NodeTypeLength {
                types: node_types.len(),
                nodes: topology.n_nodes(),
            }
            .into());
        }

        let space = StateSpace::new(annotations.n_traits())?;
        let n_annotated = (0..topology.n_nodes())
            .filter(|&node| topology.is_leaf(node) && annotations.is_annotated(node))
            .count();

        let internal: Vec<usize> = (0..topology.n_nodes())
            .filter(|&node| !topology.is_leaf(node))
            .collect();
        let duplications = internal
            .iter()
            .filter(|&&node| node_types[node] == NodeType::Duplication)
            .count();
        let duplication_share = if internal.is_empty() {
            0.0
        } else {
            usize_to_f64(duplications) / usize_to_f64(internal.len())
        };

        Ok(Self {
            topology,
            annotations,
            node_types,
            space,
            n_annotated,
            duplication_share,
            next_version: 0,
            cache: None,
        })
    }

    /// Evaluate the log-likelihood under `params`.
    ///
    /// The probability table is recomputed in full unless `params` is
    /// bit-identical to the previous snapshot, in which case the cached
    /// result (and its version) is returned.
    ///
    /// # Errors
    ///
    /// Returns `LikelihoodError::InvalidProbability` for invalid parameters.
    pub fn evaluate(
        &mut self,
        params: &ModelParameters,
        verbose: bool,
    ) -> Result<HandleEvaluation, LikelihoodError> {
        let (version, log_likelihood) = self.refresh(params)?;
        Ok(HandleEvaluation {
            version,
            log_likelihood,
            probabilities: if verbose {
                self.probabilities().cloned()
            } else {
                None
            },
        })
    }

    /// Shorthand for [`Self::evaluate`] without the probability table.
    ///
    /// # Errors
    ///
    /// See [`Self::evaluate`].
    pub fn log_likelihood(&mut self, params: &ModelParameters) -> Result<f64, LikelihoodError> {
        self.refresh(params).map(|(_, log_likelihood)| log_likelihood)
    }

    fn refresh(&mut self, params: &ModelParameters) -> Result<(u64, f64), LikelihoodError> {
        let key = params.fingerprint();
        let bits = params.bits();
        if let Some(cached) = self
            .cache
            .as_ref()
            .filter(|cached| cached.key == key && cached.bits == bits)
        {
            debug!(key, version = cached.version, "pruner cache hit");
            return Ok((cached.version, cached.log_likelihood));
        }

        params.validate()?;
        let error = ErrorMatrix::new(params.psi)?;
        let regimes = Regimes::new(
            TransitionMatrix::new(params.mu_d)?,
            TransitionMatrix::new(params.mu_s)?,
            &self.space,
        );

        let probabilities = prune(
            &self.topology,
            &self.annotations,
            &self.space,
            &error,
            params.eta,
            &regimes,
            |node| self.node_types[node],
        );
        let prior = root_node_prior(self.resolve_root(params), &self.space);
        let log_likelihood = root_log_likelihood(&probabilities, self.topology.root(), &prior);

        let version = self.next_version;
        self.next_version += 1;
        debug!(version, log_likelihood, "pruner table recomputed");

        self.cache = Some(CachedEvaluation {
            key,
            bits,
            version,
            log_likelihood,
            probabilities,
        });
        Ok((version, log_likelihood))
    }

    /// Root-state probability of `1` after resolving the stationary prior.
    #[must_use]
    pub fn resolve_root(&self, params: &ModelParameters) -> f64 {
        params
            .root
            .resolve(params.mu_d, params.mu_s, self.duplication_share)
    }

    #[must_use]
    pub const fn topology(&self) -> &TreeTopology {
        &self.topology
    }

    #[must_use]
    pub const fn annotations(&self) -> &AnnotationMatrix {
        &self.annotations
    }

    #[must_use]
    pub const fn states(&self) -> &StateSpace {
        &self.space
    }

    #[must_use]
    pub fn node_types(&self) -> &[NodeType] {
        &self.node_types
    }

    #[must_use]
    pub const fn n_nodes(&self) -> usize {
        self.topology.n_nodes()
    }

    /// Number of internal (non-leaf) nodes.
    #[must_use]
    pub fn n_internal(&self) -> usize {
        self.n_nodes() - self.n_tips()
    }

    #[must_use]
    pub fn n_tips(&self) -> usize {
        self.topology.n_tips()
    }

    /// Leaves carrying at least one non-missing annotation.
    #[must_use]
    pub const fn n_annotated(&self) -> usize {
        self.n_annotated
    }

    #[must_use]
    pub const fn n_traits(&self) -> usize {
        self.space.n_traits()
    }

    /// Share of internal nodes typed as duplications.
    #[must_use]
    pub const fn duplication_share(&self) -> f64 {
        self.duplication_share
    }

    #[must_use]
    pub fn offspring(&self) -> Vec<Vec<usize>> {
        self.topology.offspring_lists()
    }

    #[must_use]
    pub fn parents(&self) -> Vec<Vec<usize>> {
        self.topology.parent_lists()
    }

    /// Version of the most recent evaluation, if any.
    #[must_use]
    pub fn version(&self) -> Option<u64> {
        self.cache.as_ref().map(|cached| cached.version)
    }

    /// Probability table of the most recent evaluation, if any.
    #[must_use]
    pub fn probabilities(&self) -> Option<&Mat<f64>> {
        self.cache.as_ref().map(|cached| &cached.probabilities)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::models::states::MAX_TRAITS;

    fn cherry() -> (TreeTopology, AnnotationMatrix) {
        let topology = TreeTopology::from_edges(&[(0, 1), (0, 2)], 3).expect("valid tree");
        let annotations =
            AnnotationMatrix::from_codes(&[vec![9], vec![0], vec![1]]).expect("valid codes");
        (topology, annotations)
    }

    #[test]
    fn root_prior_is_product_over_traits() {
        let space = StateSpace::new(2).expect("valid");
        let prior = root_node_prior(0.3, &space);
        assert_relative_eq!(prior[0], 0.49, epsilon = 1.0e-12);
        assert_relative_eq!(prior[1], 0.21, epsilon = 1.0e-12);
        assert_relative_eq!(prior[2], 0.21, epsilon = 1.0e-12);
        assert_relative_eq!(prior[3], 0.09, epsilon = 1.0e-12);
        assert_relative_eq!(prior.iter().sum::<f64>(), 1.0, epsilon = 1.0e-12);
    }

    #[test]
    fn cherry_matches_hand_computation() {
        let (topology, annotations) = cherry();
        let result = evaluate_likelihood(
            &annotations,
            &topology,
            &[0.1, 0.2],
            &[0.3, 0.4],
            &[0.9, 0.8],
            RootPrior::Fixed(0.5),
            EvaluationOptions {
                verbose: true,
                check_dims: true,
            },
        )
        .expect("evaluation succeeds");

        // Leaf observed 0: PSI[s][0] * eta0; leaf observed 1: PSI[s][1] * eta1.
        let left = [0.9 * 0.9, 0.2 * 0.9];
        let right = [0.1 * 0.8, 0.8 * 0.8];
        let m = [[0.7, 0.3], [0.4, 0.6]];
        let root: Vec<f64> = (0..2)
            .map(|s| {
                (m[s][0] * left[0] + m[s][1] * left[1]) * (m[s][0] * right[0] + m[s][1] * right[1])
            })
            .collect();
        let expected = (0.5 * root[0] + 0.5 * root[1]).ln();

        assert_relative_eq!(result.log_likelihood, expected, epsilon = 1.0e-12);
        let pr = result.probabilities.expect("verbose table");
        assert_relative_eq!(pr[(1, 0)], left[0], epsilon = 1.0e-12);
        assert_relative_eq!(pr[(2, 1)], right[1], epsilon = 1.0e-12);
        assert_eq!(result.states.expect("verbose states").nrows(), 2);
    }

    #[test]
    fn missing_leaf_uses_bias_mixture() {
        let topology = TreeTopology::from_edges(&[], 1).expect("single node");
        let annotations = AnnotationMatrix::from_codes(&[vec![9, 9]]).expect("valid");
        let psi = [0.1, 0.2];
        let eta = [0.7, 0.6];
        let result = evaluate_likelihood(
            &annotations,
            &topology,
            &psi,
            &[0.1, 0.1],
            &eta,
            RootPrior::Fixed(0.5),
            EvaluationOptions {
                verbose: true,
                check_dims: true,
            },
        )
        .expect("evaluation succeeds");

        let per_trait = |truth: usize| {
            let error = [[0.9, 0.1], [0.2, 0.8]];
            (1.0 - eta[0]) * error[truth][0] + (1.0 - eta[1]) * error[truth][1]
        };
        let pr = result.probabilities.expect("verbose table");
        let space = StateSpace::new(2).expect("valid");
        for s in 0..4 {
            let expected = per_trait(space.value(s, 0)) * per_trait(space.value(s, 1));
            assert_relative_eq!(pr[(0, s)], expected, epsilon = 1.0e-12);
        }
    }

    #[test]
    fn perfect_reporting_without_error_is_an_indicator() {
        let topology = TreeTopology::from_edges(&[], 1).expect("single node");
        let annotations = AnnotationMatrix::from_codes(&[vec![1, 0]]).expect("valid");
        let result = evaluate_likelihood(
            &annotations,
            &topology,
            &[0.0, 0.0],
            &[0.1, 0.1],
            &[1.0, 1.0],
            RootPrior::Fixed(0.5),
            EvaluationOptions {
                verbose: true,
                check_dims: false,
            },
        )
        .expect("evaluation succeeds");
        let pr = result.probabilities.expect("verbose table");
        // Only state 1 (trait 0 present, trait 1 absent) is compatible.
        let row: Vec<f64> = (0..4).map(|s| pr[(0, s)]).collect();
        assert_eq!(row, vec![0.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn dimension_check_counts_every_failure() {
        let (topology, _) = cherry();
        let short = AnnotationMatrix::from_codes(&[vec![0], vec![1]]).expect("valid");
        let err = evaluate_likelihood(
            &short,
            &topology,
            &[0.1],
            &[0.1, 0.2, 0.3],
            &[1.0, 1.0],
            RootPrior::Fixed(0.5),
            EvaluationOptions::default(),
        )
        .unwrap_err();
        assert_eq!(err, LikelihoodError::DimensionCheckFailed { failed: 3 });
    }

    #[test]
    fn unchecked_lengths_still_fail_structurally() {
        let (topology, annotations) = cherry();
        let err = evaluate_likelihood(
            &annotations,
            &topology,
            &[0.1, 0.1],
            &[0.1],
            &[1.0, 1.0],
            RootPrior::Fixed(0.5),
            EvaluationOptions {
                verbose: false,
                check_dims: false,
            },
        )
        .unwrap_err();
        assert_eq!(
            err,
            LikelihoodError::ParameterLength {
                name: "mu",
                expected: 2,
                found: 1
            }
        );
    }

    #[test]
    fn handle_agrees_with_stateless_form() {
        let topology =
            TreeTopology::from_edges(&[(0, 1), (0, 2), (1, 3), (1, 4)], 5).expect("valid");
        let annotations = AnnotationMatrix::from_codes(&[
            vec![9, 9],
            vec![9, 9],
            vec![1, 0],
            vec![0, 9],
            vec![1, 1],
        ])
        .expect("valid");
        let psi = [0.05, 0.1];
        let mu = [0.2, 0.15];
        let eta = [0.8, 0.9];

        let stateless = evaluate_likelihood(
            &annotations,
            &topology,
            &psi,
            &mu,
            &eta,
            RootPrior::Fixed(0.4),
            EvaluationOptions::default(),
        )
        .expect("stateless");

        let mut handle = PrunerHandle::new(
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
        .expect("handle");
        let params = ModelParameters {
            psi,
            mu_d: mu,
            mu_s: mu,
            eta,
            root: RootPrior::Fixed(0.4),
        };
        let evaluation = handle.evaluate(&params, true).expect("handle evaluation");
        assert_relative_eq!(evaluation.log_likelihood, stateless.log_likelihood, epsilon = 1.0e-12);
        assert!(evaluation.probabilities.is_some());
    }

    #[test]
    fn node_types_select_transition_regime() {
        let (topology, annotations) = cherry();
        let params = ModelParameters {
            psi: [0.1, 0.1],
            mu_d: [0.4, 0.1],
            mu_s: [0.05, 0.05],
            eta: [1.0, 1.0],
            root: RootPrior::Fixed(0.5),
        };

        let mut duplication = PrunerHandle::new(
            topology.clone(),
            annotations.clone(),
            vec![NodeType::Duplication; 3],
        )
        .expect("handle");
        let mut speciation =
            PrunerHandle::new(topology.clone(), annotations.clone(), vec![NodeType::Speciation; 3])
                .expect("handle");

        let expected_d = evaluate_likelihood(
            &annotations,
            &topology,
            &params.psi,
            &params.mu_d,
            &params.eta,
            params.root,
            EvaluationOptions::default(),
        )
        .expect("stateless");
        let expected_s = evaluate_likelihood(
            &annotations,
            &topology,
            &params.psi,
            &params.mu_s,
            &params.eta,
            params.root,
            EvaluationOptions::default(),
        )
        .expect("stateless");

        let ll_d = duplication.log_likelihood(&params).expect("evaluates");
        let ll_s = speciation.log_likelihood(&params).expect("evaluates");
        assert_relative_eq!(ll_d, expected_d.log_likelihood, epsilon = 1.0e-12);
        assert_relative_eq!(ll_s, expected_s.log_likelihood, epsilon = 1.0e-12);
        assert!((ll_d - ll_s).abs() > 1.0e-6);
    }

    #[test]
    fn cache_reuses_bit_identical_snapshots_only() {
        let (topology, annotations) = cherry();
        let mut handle = PrunerHandle::new(topology, annotations, vec![NodeType::Speciation; 3])
            .expect("handle");
        assert_eq!(handle.version(), None);

        let params = ModelParameters::default();
        let first = handle.evaluate(&params, false).expect("evaluates");
        let again = handle.evaluate(&params, false).expect("evaluates");
        assert_eq!(first.version, again.version);
        assert!(first.probabilities.is_none());

        let changed = ModelParameters {
            eta: [0.9, 0.9],
            ..params
        };
        let third = handle.evaluate(&changed, false).expect("evaluates");
        assert_eq!(third.version, first.version + 1);
        assert_eq!(handle.version(), Some(third.version));
    }

    #[test]
    fn stationary_root_uses_duplication_share() {
        let topology =
            TreeTopology::from_edges(&[(0, 1), (0, 2), (1, 3), (1, 4)], 5).expect("valid");
        let annotations = AnnotationMatrix::missing(5, 1).expect("valid");
        let handle = PrunerHandle::new(
            topology,
            annotations,
            vec![
                NodeType::Duplication,
                NodeType::Speciation,
                NodeType::Duplication,
                NodeType::Duplication,
                NodeType::Duplication,
            ],
        )
        .expect("handle");

        // Leaf types are ignored: one of two internal nodes is a duplication.
        assert_relative_eq!(handle.duplication_share(), 0.5, epsilon = 1.0e-12);
        let params = ModelParameters {
            mu_d: [0.1, 0.3],
            mu_s: [0.2, 0.2],
            ..ModelParameters::default()
        };
        assert_relative_eq!(
            handle.resolve_root(&params),
            0.5 * 0.25 + 0.5 * 0.5,
            epsilon = 1.0e-12
        );
    }

    #[test]
    fn handle_accessors_describe_the_tree() {
        let topology =
            TreeTopology::from_edges(&[(0, 1), (0, 2), (1, 3), (1, 4)], 5).expect("valid");
        let annotations = AnnotationMatrix::from_codes(&[
            vec![9, 9, 9],
            vec![9, 9, 9],
            vec![1, 9, 9],
            vec![9, 9, 9],
            vec![0, 0, 1],
        ])
        .expect("valid");
        let handle = PrunerHandle::new(topology, annotations, vec![NodeType::Speciation; 5])
            .expect("handle");

        assert_eq!(handle.n_nodes(), 5);
        assert_eq!(handle.n_tips(), 3);
        assert_eq!(handle.n_internal(), 2);
        assert_eq!(handle.n_annotated(), 2);
        assert_eq!(handle.n_traits(), 3);
        assert_eq!(handle.offspring()[1], vec![3, 4]);
        assert_eq!(handle.parents()[4], vec![1]);
    }

    #[test]
    fn handle_rejects_short_type_vector() {
        let (topology, annotations) = cherry();
        let err =
            PrunerHandle::new(topology, annotations, vec![NodeType::Speciation; 2]).unwrap_err();
        assert_eq!(
            err,
            LikelihoodError::InvalidInput(InputError::NodeTypeLength { types: 2, nodes: 3 })
        );
    }

    #[test]
    fn independent_traits_add_log_likelihoods_at_the_trait_cap() {
        // Identical annotations on every trait: the joint likelihood is the
        // single-trait likelihood raised to the trait count.
        let topology = TreeTopology::from_edges(&[(0, 1), (0, 2)], 3).expect("valid tree");
        let wide = AnnotationMatrix::from_codes(&[
            vec![9; MAX_TRAITS],
            vec![0; MAX_TRAITS],
            vec![1; MAX_TRAITS],
        ])
        .expect("valid codes");
        let (_, narrow) = cherry();
        let evaluate = |annotations: &AnnotationMatrix| {
            evaluate_likelihood(
                annotations,
                &topology,
                &[0.1, 0.2],
                &[0.3, 0.4],
                &[0.9, 0.8],
                RootPrior::Fixed(0.5),
                EvaluationOptions::default(),
            )
            .expect("evaluation succeeds")
            .log_likelihood
        };
        let single = evaluate(&narrow);
        let joint = evaluate(&wide);
        assert_relative_eq!(joint, usize_to_f64(MAX_TRAITS) * single, epsilon = 1.0e-9);

        let too_wide = AnnotationMatrix::missing(3, MAX_TRAITS + 1).expect("valid");
        assert!(matches!(
            PrunerHandle::new(topology.clone(), too_wide, vec![NodeType::Speciation; 3]),
            Err(LikelihoodError::TooManyTraits { .. })
        ));
    }
}
