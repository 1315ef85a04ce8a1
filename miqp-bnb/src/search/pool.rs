//! Node pool: the active frontier plus the accepted solutions.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use super::{NodeStatus, SearchNode};
use crate::model::Solution;

/// Entry in the frontier with its insertion sequence number.
struct QueuedNode {
    node: SearchNode,
    seq: u64,
}

impl PartialEq for QueuedNode {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueuedNode {}

impl PartialOrd for QueuedNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max-heap: lowest bound first, then oldest first
        other
            .node
            .dual_bound
            .total_cmp(&self.node.dual_bound)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Active nodes ordered best-bound-first (FIFO on ties) and the sequence of
/// accepted solutions.
#[derive(Default)]
pub struct NodePool {
    heap: BinaryHeap<QueuedNode>,
    next_seq: u64,
    solutions: Vec<Solution>,
    unactive: u64,
}

impl NodePool {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node to the frontier.
    pub fn push(&mut self, mut node: SearchNode) {
        node.status = NodeStatus::Active;
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(QueuedNode { node, seq });
    }

    /// Get the next node to process.
    pub fn pop(&mut self) -> Option<SearchNode> {
        self.heap.pop().map(|q| q.node)
    }

    /// The node `pop` would return.
    pub fn best_node(&self) -> Option<&SearchNode> {
        self.heap.peek().map(|q| &q.node)
    }

    /// Get the best (lowest) dual bound in the frontier (`+inf` when empty).
    pub fn lower_bound(&self) -> f64 {
        self.heap
            .iter()
            .map(|q| q.node.dual_bound)
            .fold(f64::INFINITY, f64::min)
    }

    /// Check if the frontier is empty.
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Number of active nodes.
    pub fn num_active(&self) -> usize {
        self.heap.len()
    }

    /// Number of processed nodes since the last reset.
    pub fn num_unactive(&self) -> u64 {
        self.unactive
    }

    /// Record a processed node.
    pub fn retire(&mut self, node: &mut SearchNode, status: NodeStatus) {
        node.status = status;
        self.unactive += 1;
    }

    /// Prune nodes that are dominated by the cutoff.
    ///
    /// Returns the number of pruned nodes.
    pub fn prune_by_bound(&mut self, cutoff: f64, tolerance: f64) -> usize {
        let before = self.heap.len();

        let remaining: Vec<QueuedNode> = self
            .heap
            .drain()
            .filter(|q| !q.node.can_prune(cutoff, tolerance))
            .collect();
        self.heap = remaining.into_iter().collect();

        let pruned = before - self.heap.len();
        self.unactive += pruned as u64;
        pruned
    }

    /// Drop every cached relaxation in the frontier.
    pub fn invalidate_all(&mut self) {
        let nodes: Vec<QueuedNode> = self
            .heap
            .drain()
            .map(|mut q| {
                q.node.invalidate();
                q
            })
            .collect();
        self.heap = nodes.into_iter().collect();
    }

    /// Remove and return the whole frontier in pop order.
    pub fn take_all(&mut self) -> Vec<SearchNode> {
        let mut sorted = std::mem::take(&mut self.heap).into_sorted_vec();
        // into_sorted_vec is ascending; the best entry is the greatest
        sorted.reverse();
        sorted.into_iter().map(|q| q.node).collect()
    }

    /// Discard the frontier and reinstate a root node.
    pub fn restart(&mut self, root: SearchNode) {
        self.heap.clear();
        self.push(root);
    }

    /// Discard all active nodes.
    pub fn clear_nodes(&mut self) {
        self.heap.clear();
    }

    /// Discard the processed-node bookkeeping.
    pub fn clear_unactive(&mut self) {
        self.unactive = 0;
    }

    // ---------------------------------------------------------------------
    // Solutions
    // ---------------------------------------------------------------------

    /// Record an accepted solution.
    pub fn add_solution(&mut self, solution: Solution) {
        self.solutions.push(solution);
    }

    /// Accepted solutions in acceptance order.
    pub fn solutions(&self) -> &[Solution] {
        &self.solutions
    }

    /// Number of accepted solutions.
    pub fn num_solutions(&self) -> usize {
        self.solutions.len()
    }

    /// Solution with the minimum objective (first one on ties).
    pub fn best_solution(&self) -> Option<&Solution> {
        self.solutions
            .iter()
            .reduce(|best, s| if s.objective < best.objective { s } else { best })
    }

    /// Keep only the solutions the closure accepts (it may rewrite them).
    ///
    /// Returns the number of dropped solutions.
    pub fn retain_solutions<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(&mut Solution) -> bool,
    {
        let before = self.solutions.len();
        self.solutions.retain_mut(|s| keep(s));
        before - self.solutions.len()
    }

    /// Discard all solutions.
    pub fn clear_solutions(&mut self) {
        self.solutions.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: u64, bound: f64) -> SearchNode {
        let mut n = SearchNode::root(id);
        n.dual_bound = bound;
        n
    }

    #[test]
    fn test_best_bound_selection() {
        let mut pool = NodePool::new();
        pool.push(node(1, 10.0));
        pool.push(node(2, 5.0));
        pool.push(node(3, 15.0));

        assert_eq!(pool.lower_bound(), 5.0);
        assert_eq!(pool.best_node().map(|n| n.id), Some(2));

        assert_eq!(pool.pop().unwrap().id, 2);
        assert_eq!(pool.pop().unwrap().id, 1);
        assert_eq!(pool.pop().unwrap().id, 3);
        assert!(pool.is_empty());
        assert_eq!(pool.lower_bound(), f64::INFINITY);
    }

    #[test]
    fn test_fifo_on_ties() {
        let mut pool = NodePool::new();
        for id in [7, 3, 9, 1] {
            pool.push(node(id, 2.0));
        }
        let order: Vec<u64> = std::iter::from_fn(|| pool.pop().map(|n| n.id)).collect();
        assert_eq!(order, vec![7, 3, 9, 1]);
    }

    #[test]
    fn test_take_all_in_pop_order() {
        let mut pool = NodePool::new();
        pool.push(node(1, 3.0));
        pool.push(node(2, 1.0));
        pool.push(node(3, 1.0));
        let ids: Vec<u64> = pool.take_all().into_iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
        assert!(pool.is_empty());
    }

    #[test]
    fn test_pruning() {
        let mut pool = NodePool::new();
        for i in 0..5 {
            pool.push(node(i, i as f64 * 10.0)); // 0, 10, 20, 30, 40
        }

        // Prune nodes with bound >= 25
        let pruned = pool.prune_by_bound(25.0, 1e-9);
        assert_eq!(pruned, 2);
        assert_eq!(pool.num_active(), 3);
        assert_eq!(pool.num_unactive(), 2);
    }

    #[test]
    fn test_solutions() {
        let mut pool = NodePool::new();
        assert!(pool.best_solution().is_none());
        for (id, obj) in [(1, 3.0), (2, 1.0), (3, 1.0)] {
            pool.add_solution(Solution {
                point: vec![obj],
                objective: obj,
                node_id: id,
                worker: 0,
            });
        }
        assert_eq!(pool.best_solution().map(|s| s.node_id), Some(2));

        let dropped = pool.retain_solutions(|s| s.objective < 2.0);
        assert_eq!(dropped, 1);
        assert_eq!(pool.num_solutions(), 2);
    }
}
