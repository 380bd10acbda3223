//! # Tree topology
//!
//! Rooted tree stored as an arena indexed by node id: a flat child array
//! addressed through per-node offset ranges, a parent table, and a
//! precomputed postorder sequence in which every node follows all of its
//! descendants and the root comes last.

use thiserror::Error;

/// Structural problems found while building a topology.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error("tree must have at least one node")]
    Empty,
    #[error("edge ({parent}, {child}) references a node outside 0..{n_nodes}")]
    NodeOutOfRange {
        parent: usize,
        child: usize,
        n_nodes: usize,
    },
    #[error("node {node} is listed as its own parent")]
    SelfLoop { node: usize },
    #[error("node {child} has more than one parent ({first} and {second})")]
    MultipleParents {
        child: usize,
        first: usize,
        second: usize,
    },
    #[error("no root found; every node has a parent")]
    NoRoot,
    #[error("tree has {count} roots; expected exactly one (first two: {first}, {second})")]
    MultipleRoots {
        count: usize,
        first: usize,
        second: usize,
    },
    #[error("node {node} is not reachable from root {root}")]
    Unreachable { node: usize, root: usize },
}

/// Rooted tree topology with a fixed evaluation order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeTopology {
    parents: Vec<Option<usize>>,
    child_offsets: Vec<usize>,
    children: Vec<usize>,
    postorder: Vec<usize>,
    root: usize,
}

impl TreeTopology {
    /// Build a topology from `(parent, child)` edges over nodes `0..n_nodes`.
    ///
    /// Children keep the order in which their edges appear.
    ///
    /// # Errors
    ///
    /// Returns `TreeError` unless the edges describe a single rooted tree
    /// spanning exactly `n_nodes` nodes.
    pub fn from_edges(edges: &[(usize, usize)], n_nodes: usize) -> Result<Self, TreeError> {
        if n_nodes == 0 {
            return Err(TreeError::Empty);
        }

        let mut parents: Vec<Option<usize>> = vec![None; n_nodes];
        for &(parent, child) in edges {
            if parent >= n_nodes || child >= n_nodes {
                return Err(TreeError::NodeOutOfRange {
                    parent,
                    child,
                    n_nodes,
                });
            }
            if parent == child {
                return Err(TreeError::SelfLoop { node: child });
            }
            if let Some(first) = parents[child] {
                return Err(TreeError::MultipleParents {
                    child,
                    first,
                    second: parent,
                });
            }
            parents[child] = Some(parent);
        }

        let mut counts = vec![0usize; n_nodes];
        for &(parent, _) in edges {
            counts[parent] += 1;
        }
        let mut child_offsets = Vec::with_capacity(n_nodes + 1);
        child_offsets.push(0);
        for count in &counts {
            let last = child_offsets[child_offsets.len() - 1];
            child_offsets.push(last + count);
        }
        let mut cursor = child_offsets[..n_nodes].to_vec();
        let mut children = vec![0usize; edges.len()];
        for &(parent, child) in edges {
            children[cursor[parent]] = child;
            cursor[parent] += 1;
        }

        let root = find_root(&parents)?;
        let mut topology = Self {
            parents,
            child_offsets,
            children,
            postorder: Vec::with_capacity(n_nodes),
            root,
        };
        topology.postorder = topology.compute_postorder()?;
        Ok(topology)
    }

    /// Build a topology from a parent table (`None` marks the root).
    ///
    /// # Errors
    ///
    /// Returns `TreeError` for the same structural problems as [`Self::from_edges`].
    pub fn from_parents(parents: &[Option<usize>]) -> Result<Self, TreeError> {
        let edges: Vec<(usize, usize)> = parents
            .iter()
            .enumerate()
            .filter_map(|(child, parent)| parent.map(|parent| (parent, child)))
            .collect();
        Self::from_edges(&edges, parents.len())
    }

    fn compute_postorder(&self) -> Result<Vec<usize>, TreeError> {
        let n_nodes = self.n_nodes();
        let mut order = Vec::with_capacity(n_nodes);
        let mut visited = vec![false; n_nodes];
        let mut stack = vec![(self.root, 0usize)];
        visited[self.root] = true;

        while let Some((node, next_child)) = stack.pop() {
            let offspring = self.offspring(node);
            if let Some(&child) = offspring.get(next_child) {
                stack.push((node, next_child + 1));
                if !visited[child] {
                    visited[child] = true;
                    stack.push((child, 0));
                }
            } else {
                order.push(node);
            }
        }

        if let Some(node) = visited.iter().position(|seen| !seen) {
            return Err(TreeError::Unreachable {
                node,
                root: self.root,
            });
        }
        Ok(order)
    }

    #[must_use]
    pub const fn n_nodes(&self) -> usize {
        self.parents.len()
    }

    /// Number of leaves (nodes without offspring).
    #[must_use]
    pub fn n_tips(&self) -> usize {
        (0..self.n_nodes()).filter(|&node| self.is_leaf(node)).count()
    }

    #[must_use]
    pub const fn root(&self) -> usize {
        self.root
    }

    /// Node ids with every node after all of its descendants; the root is last.
    #[must_use]
    pub fn postorder(&self) -> &[usize] {
        &self.postorder
    }

    #[must_use]
    pub fn offspring(&self, node: usize) -> &[usize] {
        &self.children[self.child_offsets[node]..self.child_offsets[node + 1]]
    }

    #[must_use]
    pub fn parent(&self, node: usize) -> Option<usize> {
        self.parents[node]
    }

    #[must_use]
    pub fn is_leaf(&self, node: usize) -> bool {
        self.child_offsets[node] == self.child_offsets[node + 1]
    }

    /// Per-node offspring lists; leaves get empty lists.
    #[must_use]
    pub fn offspring_lists(&self) -> Vec<Vec<usize>> {
        (0..self.n_nodes())
            .map(|node| self.offspring(node).to_vec())
            .collect()
    }

    /// Per-node parent lists; the root gets an empty list.
    #[must_use]
    pub fn parent_lists(&self) -> Vec<Vec<usize>> {
        self.parents
            .iter()
            .map(|parent| parent.iter().copied().collect())
            .collect()
    }

    /// Nodes in preorder (root first), i.e. the reverse postorder.
    pub fn preorder(&self) -> impl Iterator<Item = usize> + '_ {
        self.postorder.iter().rev().copied()
    }
}

fn find_root(parents: &[Option<usize>]) -> Result<usize, TreeError> {
    let mut roots = parents
        .iter()
        .enumerate()
        .filter(|(_, parent)| parent.is_none())
        .map(|(node, _)| node);

    let first = roots.next().ok_or(TreeError::NoRoot)?;
    if let Some(second) = roots.next() {
        return Err(TreeError::MultipleRoots {
            count: 2 + roots.count(),
            first,
            second,
        });
    }
    Ok(first)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn balanced() -> TreeTopology {
        // 0 -> (1, 2), 1 -> (3, 4)
        TreeTopology::from_edges(&[(0, 1), (0, 2), (1, 3), (1, 4)], 5).expect("valid tree")
    }

    #[test]
    fn postorder_places_descendants_first() {
        let tree = balanced();
        let order = tree.postorder();
        assert_eq!(order.len(), 5);
        assert_eq!(order.last(), Some(&tree.root()));

        let mut position = vec![0; 5];
        for (idx, node) in order.iter().enumerate() {
            position[*node] = idx;
        }
        for node in 0..5 {
            for &child in tree.offspring(node) {
                assert!(position[child] < position[node]);
            }
        }
    }

    #[test]
    fn child_lists_keep_edge_order() {
        let tree = balanced();
        assert_eq!(tree.offspring(0), &[1, 2]);
        assert_eq!(tree.offspring(1), &[3, 4]);
        assert!(tree.offspring(2).is_empty());
        assert_eq!(tree.n_tips(), 3);
        assert_eq!(tree.parent_lists()[3], vec![1]);
        assert!(tree.parent_lists()[0].is_empty());
    }

    #[test]
    fn single_node_tree_is_its_own_root() {
        let tree = TreeTopology::from_edges(&[], 1).expect("single node");
        assert_eq!(tree.postorder(), &[0]);
        assert!(tree.is_leaf(0));
    }

    #[test]
    fn multiple_roots_are_rejected() {
        let err = TreeTopology::from_edges(&[(0, 1)], 3).unwrap_err();
        assert_eq!(
            err,
            TreeError::MultipleRoots {
                count: 2,
                first: 0,
                second: 2
            }
        );
    }

    #[test]
    fn cycles_are_rejected() {
        // 0 is the root; 1 and 2 form a detached cycle.
        let err = TreeTopology::from_edges(&[(1, 2), (2, 1)], 3).unwrap_err();
        assert_eq!(err, TreeError::Unreachable { node: 1, root: 0 });

        let err = TreeTopology::from_edges(&[(0, 1), (1, 0)], 2).unwrap_err();
        assert_eq!(err, TreeError::NoRoot);
    }

    #[test]
    fn second_parent_is_rejected() {
        let err = TreeTopology::from_edges(&[(0, 2), (1, 2)], 3).unwrap_err();
        assert_eq!(
            err,
            TreeError::MultipleParents {
                child: 2,
                first: 0,
                second: 1
            }
        );
    }

    #[test]
    fn out_of_range_and_self_loops() {
        assert!(matches!(
            TreeTopology::from_edges(&[(0, 3)], 3),
            Err(TreeError::NodeOutOfRange { .. })
        ));
        assert_eq!(
            TreeTopology::from_edges(&[(1, 1)], 2),
            Err(TreeError::SelfLoop { node: 1 })
        );
        assert_eq!(TreeTopology::from_edges(&[], 0), Err(TreeError::Empty));
    }

    #[test]
    fn parent_table_matches_edge_list() {
        let from_parents =
            TreeTopology::from_parents(&[None, Some(0), Some(0), Some(1), Some(1)]).expect("valid");
        assert_eq!(from_parents, balanced());
    }
}
