#![forbid(unsafe_code)]

//! # `aphylo`
//!
//! Likelihood-based inference of gene function on annotated phylogenies.
//!
//! Leaves carry noisy, partially missing binary annotations for one or more
//! traits. The crate evaluates the pruning likelihood under a gain/loss
//! model with distinct duplication and speciation regimes, reconstructs
//! per-node posterior probabilities, and samples the parameters with a
//! reflected random-walk Metropolis-Hastings chain.

pub mod inference;
pub mod input;
pub mod models;
pub mod tree;
pub mod utils;

pub use inference::{
    Bounds, Chain, ChainConfig, ChainSummary, InferenceError, MultiChainOptions, Objective,
    ParameterSummary, ProposalStats, SamplerKind, SummaryOptions, autocorrelation,
    componentwise_step, effective_sample_size, reflect, reflected_proposal, run_chain,
    run_chain_with_rng, run_chains, split_rhat, summarize_chain,
};
pub use input::{Annotation, AnnotationMatrix, InputError, MISSING_CODE, NodeType};
pub use tree::{TreeError, TreeTopology};

pub use models::matrices::{
    ErrorMatrix, TransitionMatrix, error_matrix, stationary_gain, transition_matrix,
};
pub use models::objective::{
    BetaPrior, N_PARAMETERS, PARAMETER_NAMES, PhyloObjective, PriorConfig, log_beta_density,
};
pub use models::posterior::{PosteriorProbabilities, posterior_probabilities};
pub use models::pruning::{EvaluationOptions, PrunerHandle, evaluate_likelihood, root_node_prior};
pub use models::states::{MAX_TRAITS, StateSpace, enumerate_states};
pub use models::types::{HandleEvaluation, Likelihood, LikelihoodError, ModelParameters, RootPrior};
