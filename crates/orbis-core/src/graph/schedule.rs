//! Dependency graph over atomic components and its topological order.
//!
//! Nodes are atom ordinals (position of the atomic component in the
//! pre-order walk of the hierarchy). An edge `a -> b` means that `b` reads a
//! signal or parameter produced by `a`, so `a` must run first.

use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap};

/// Directed dependency graph between atom ordinals.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct DependencyGraph {
    count: usize,
    edges: BTreeSet<(usize, usize)>,
}

impl DependencyGraph {
    pub fn new(count: usize) -> Self {
        Self {
            count,
            edges: BTreeSet::new(),
        }
    }

    /// Records that `to` depends on `from`.
    pub fn add_edge(&mut self, from: usize, to: usize) {
        self.edges.insert((from, to));
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Topological order via Kahn's algorithm.
    ///
    /// Ready nodes are taken lowest ordinal first, so the order is a pure
    /// function of the graph. On a cycle, returns the nodes that could not be
    /// ordered.
    pub fn kahn_sort(&self) -> Result<Vec<usize>, Vec<usize>> {
        let n = self.count;
        let mut in_degree = vec![0usize; n];
        let mut outgoing: Vec<Vec<usize>> = vec![Vec::new(); n];
        for &(from, to) in &self.edges {
            in_degree[to] += 1;
            outgoing[from].push(to);
        }

        let mut ready: BinaryHeap<Reverse<usize>> = (0..n)
            .filter(|&i| in_degree[i] == 0)
            .map(Reverse)
            .collect();

        let mut sorted = Vec::with_capacity(n);
        while let Some(Reverse(idx)) = ready.pop() {
            sorted.push(idx);
            for &to in &outgoing[idx] {
                in_degree[to] -= 1;
                if in_degree[to] == 0 {
                    ready.push(Reverse(to));
                }
            }
        }

        if sorted.len() != n {
            let placed: BTreeSet<usize> = sorted.iter().copied().collect();
            return Err((0..n).filter(|i| !placed.contains(i)).collect());
        }
        Ok(sorted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn independent_nodes_keep_ordinal_order() {
        let g = DependencyGraph::new(4);
        assert_eq!(g.kahn_sort().unwrap(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn dependencies_reorder() {
        let mut g = DependencyGraph::new(3);
        g.add_edge(2, 0);
        g.add_edge(0, 1);
        assert_eq!(g.kahn_sort().unwrap(), vec![2, 0, 1]);
    }

    #[test]
    fn diamond() {
        let mut g = DependencyGraph::new(4);
        g.add_edge(0, 1);
        g.add_edge(0, 2);
        g.add_edge(1, 3);
        g.add_edge(2, 3);
        g.add_edge(2, 3);
        assert_eq!(g.edge_count(), 4);
        assert_eq!(g.kahn_sort().unwrap(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn cycle_reports_members() {
        let mut g = DependencyGraph::new(4);
        g.add_edge(0, 1);
        g.add_edge(1, 2);
        g.add_edge(2, 1);
        assert_eq!(g.kahn_sort().unwrap_err(), vec![1, 2]);
    }

    #[test]
    fn self_loop_is_a_cycle() {
        let mut g = DependencyGraph::new(1);
        g.add_edge(0, 0);
        assert_eq!(g.kahn_sort().unwrap_err(), vec![0]);
    }
}
