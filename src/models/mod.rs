//! # Models
//!
//! Evolutionary model of binary functional annotations on a gene tree:
//! latent state enumeration, measurement-error and gain/loss matrices, the
//! pruning likelihood, ancestral-state reconstruction, and the log-posterior
//! objective consumed by the samplers.

pub mod matrices;
pub mod objective;
pub mod posterior;
pub mod pruning;
pub mod states;
pub mod types;
