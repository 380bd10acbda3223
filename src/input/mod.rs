//! # Annotation inputs
//!
//! Defines the per-node, per-trait annotation matrix and the node-type
//! labels consumed by the pruning engine.
//!
//! # Examples
//!
//! ```
//! use aphylo::{Annotation, AnnotationMatrix};
//!
//! let annotations = AnnotationMatrix::from_codes(&[vec![9], vec![0], vec![1]]).unwrap();
//! assert_eq!(annotations.n_nodes(), 3);
//! assert_eq!(annotations.get(0, 0), Annotation::Missing);
//! ```
//!
//! ```
//! use aphylo::AnnotationMatrix;
//!
//! // Rows must all carry the same number of traits.
//! assert!(AnnotationMatrix::from_codes(&[vec![0, 1], vec![1]]).is_err());
//! ```

use thiserror::Error;

/// Legacy integer code for an unobserved annotation.
pub const MISSING_CODE: u8 = 9;

/// Errors returned when building or validating annotation inputs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("annotation matrix must have at least one node")]
    EmptyAnnotations,
    #[error("annotation matrix must have at least one trait")]
    NoTraits,
    #[error("annotation row {row} has {found} traits; expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error(
        "invalid annotation code {code} at node {node}, trait {trait_index}; expected 0, 1, or 9"
    )]
    InvalidCode {
        node: usize,
        trait_index: usize,
        code: u8,
    },
    #[error(
        "invalid node type code {code} at node {node}; expected 0 (duplication) or 1 (speciation)"
    )]
    InvalidNodeType { node: usize, code: u8 },
    #[error("node types length ({types}) must match node count ({nodes})")]
    NodeTypeLength { types: usize, nodes: usize },
}

/// A single experimental annotation for one trait at one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Annotation {
    /// Trait reported absent.
    Absent,
    /// Trait reported present.
    Present,
    /// No experimental observation.
    #[default]
    Missing,
}

impl Annotation {
    /// Decode the legacy `0 / 1 / 9` coding.
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Absent),
            1 => Some(Self::Present),
            MISSING_CODE => Some(Self::Missing),
            _ => None,
        }
    }

    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Absent => 0,
            Self::Present => 1,
            Self::Missing => MISSING_CODE,
        }
    }

    /// Observed symbol as a matrix column index, or `None` if missing.
    #[must_use]
    pub const fn observed(self) -> Option<usize> {
        match self {
            Self::Absent => Some(0),
            Self::Present => Some(1),
            Self::Missing => None,
        }
    }

    #[must_use]
    pub const fn is_missing(self) -> bool {
        matches!(self, Self::Missing)
    }
}

impl From<bool> for Annotation {
    fn from(present: bool) -> Self {
        if present { Self::Present } else { Self::Absent }
    }
}

impl From<Option<bool>> for Annotation {
    fn from(value: Option<bool>) -> Self {
        value.map_or(Self::Missing, Self::from)
    }
}

/// Dense `n_nodes x n_traits` annotation matrix stored row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationMatrix {
    n_nodes: usize,
    n_traits: usize,
    cells: Vec<Annotation>,
}

impl AnnotationMatrix {
    /// # Errors
    ///
    /// Returns `InputError` if there are no rows, no traits, or rows differ in length.
    pub fn from_rows(rows: &[Vec<Annotation>]) -> Result<Self, InputError> {
        let n_traits = rows.first().ok_or(InputError::EmptyAnnotations)?.len();
        if n_traits == 0 {
            return Err(InputError::NoTraits);
        }

        let mut cells = Vec::with_capacity(rows.len() * n_traits);
        for (row, values) in rows.iter().enumerate() {
            if values.len() != n_traits {
                return Err(InputError::RaggedRow {
                    row,
                    expected: n_traits,
                    found: values.len(),
                });
            }
            cells.extend_from_slice(values);
        }

        Ok(Self {
            n_nodes: rows.len(),
            n_traits,
            cells,
        })
    }

    /// Build from the legacy integer coding where `9` marks a missing value.
    ///
    /// # Errors
    ///
    /// Returns `InputError` on unknown codes or malformed rows.
    pub fn from_codes(rows: &[Vec<u8>]) -> Result<Self, InputError> {
        let decoded = rows
            .iter()
            .enumerate()
            .map(|(node, values)| {
                values
                    .iter()
                    .enumerate()
                    .map(|(trait_index, &code)| {
                        Annotation::from_code(code).ok_or(InputError::InvalidCode {
                            node,
                            trait_index,
                            code,
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_rows(&decoded)
    }

    /// A matrix with every cell missing.
    ///
    /// # Errors
    ///
    /// Returns `InputError` if either dimension is zero.
    pub fn missing(n_nodes: usize, n_traits: usize) -> Result<Self, InputError> {
        if n_nodes == 0 {
            return Err(InputError::EmptyAnnotations);
        }
        if n_traits == 0 {
            return Err(InputError::NoTraits);
        }
        Ok(Self {
            n_nodes,
            n_traits,
            cells: vec![Annotation::Missing; n_nodes * n_traits],
        })
    }

    #[must_use]
    pub const fn n_nodes(&self) -> usize {
        self.n_nodes
    }

    #[must_use]
    pub const fn n_traits(&self) -> usize {
        self.n_traits
    }

    /// # Panics
    ///
    /// Panics if `node` or `trait_index` is out of range.
    #[must_use]
    pub fn get(&self, node: usize, trait_index: usize) -> Annotation {
        assert!(trait_index < self.n_traits, "trait index out of range");
        self.cells[node * self.n_traits + trait_index]
    }

    /// # Panics
    ///
    /// Panics if `node` or `trait_index` is out of range.
    pub fn set(&mut self, node: usize, trait_index: usize, value: Annotation) {
        assert!(trait_index < self.n_traits, "trait index out of range");
        self.cells[node * self.n_traits + trait_index] = value;
    }

    /// Annotations of one node across all traits.
    #[must_use]
    pub fn row(&self, node: usize) -> &[Annotation] {
        let start = node * self.n_traits;
        &self.cells[start..start + self.n_traits]
    }

    /// Whether `node` carries at least one non-missing observation.
    #[must_use]
    pub fn is_annotated(&self, node: usize) -> bool {
        self.row(node).iter().any(|value| !value.is_missing())
    }
}

/// Event type of an internal node, selecting its transition regime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NodeType {
    Duplication,
    #[default]
    Speciation,
}

impl NodeType {
    /// Decode the legacy coding: `0` duplication, `1` speciation.
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Duplication),
            1 => Some(Self::Speciation),
            _ => None,
        }
    }

    /// Decode a full vector of legacy node-type codes.
    ///
    /// # Errors
    ///
    /// Returns `InputError::InvalidNodeType` on the first unknown code.
    pub fn from_codes(codes: &[u8]) -> Result<Vec<Self>, InputError> {
        codes
            .iter()
            .enumerate()
            .map(|(node, &code)| {
                Self::from_code(code).ok_or(InputError::InvalidNodeType { node, code })
            })
            .collect()
    }
}
