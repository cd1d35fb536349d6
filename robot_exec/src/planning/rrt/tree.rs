//! Arena storage for the sampling tree
//!
//! Nodes live in a `Vec` and refer to their parent by index. A node's parent is set when it is
//! inserted and never changes, and a parent always has a smaller index than its children, so the
//! tree cannot contain a cycle.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use nalgebra::Vector2;
use serde::Serialize;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct TreeNode {
    pub position_m: Vector2<f64>,

    /// None for the root only
    pub parent: Option<usize>,

    /// Length of the route from the root to this node
    pub cost_m: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Tree {
    nodes: Vec<TreeNode>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Tree {
    /// Index of the root node.
    pub const ROOT: usize = 0;

    pub fn new(root_m: Vector2<f64>) -> Self {
        Self {
            nodes: vec![TreeNode {
                position_m: root_m,
                parent: None,
                cost_m: 0.0,
            }],
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    pub fn position(&self, idx: usize) -> Vector2<f64> {
        self.nodes[idx].position_m
    }

    /// Add a node as a child of `parent`, returning its index.
    pub fn insert(&mut self, position_m: Vector2<f64>, parent: usize) -> usize {
        let parent_node = &self.nodes[parent];
        let cost_m = parent_node.cost_m + (position_m - parent_node.position_m).norm();

        self.nodes.push(TreeNode {
            position_m,
            parent: Some(parent),
            cost_m,
        });

        self.nodes.len() - 1
    }

    /// The node nearest to `point`. Ties go to the node inserted first.
    pub fn nearest(&self, point: &Vector2<f64>) -> usize {
        let mut best = Self::ROOT;
        let mut best_dist_sq = std::f64::INFINITY;

        for (i, node) in self.nodes.iter().enumerate() {
            let dist_sq = (node.position_m - point).norm_squared();
            if dist_sq < best_dist_sq {
                best = i;
                best_dist_sq = dist_sq;
            }
        }

        best
    }

    /// Positions from the root to the node at `idx`, inclusive.
    pub fn route_to(&self, idx: usize) -> Vec<Vector2<f64>> {
        let mut route = Vec::new();
        let mut current = Some(idx);

        while let Some(i) = current {
            route.push(self.nodes[i].position_m);
            current = self.nodes[i].parent;
        }

        route.reverse();
        route
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_route_and_cost() {
        let mut tree = Tree::new(Vector2::new(0.0, 0.0));
        let a = tree.insert(Vector2::new(1.0, 0.0), Tree::ROOT);
        let b = tree.insert(Vector2::new(1.0, 1.0), a);
        let _c = tree.insert(Vector2::new(-1.0, 0.0), Tree::ROOT);

        assert_eq!(tree.len(), 4);
        assert_eq!(tree.nodes()[b].cost_m, 2.0);
        assert_eq!(
            tree.route_to(b),
            vec![
                Vector2::new(0.0, 0.0),
                Vector2::new(1.0, 0.0),
                Vector2::new(1.0, 1.0)
            ]
        );
        assert_eq!(tree.route_to(Tree::ROOT), vec![Vector2::new(0.0, 0.0)]);
    }

    #[test]
    fn test_nearest_ties_by_insertion() {
        let mut tree = Tree::new(Vector2::new(0.0, 0.0));
        let a = tree.insert(Vector2::new(1.0, 1.0), Tree::ROOT);
        tree.insert(Vector2::new(1.0, -1.0), Tree::ROOT);

        // Equidistant from both children
        assert_eq!(tree.nearest(&Vector2::new(2.0, 0.0)), a);
        assert_eq!(tree.nearest(&Vector2::new(-0.1, 0.0)), Tree::ROOT);
    }
}
