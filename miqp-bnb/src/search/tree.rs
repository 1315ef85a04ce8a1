//! Branch-and-bound tree controller.

use std::time::Instant;

use super::{
    BoundBroker, BranchDecision, BranchingEngine, NodePool, NodeRelaxation, NodeStatus,
    SearchNode,
};
use crate::coordination::PeerLink;
use crate::error::{BnbError, BnbResult};
use crate::model::{EditImpact, ProblemModel, SearchStatus, Solution, StopReason};
use crate::settings::BbSettings;
use crate::subsolver::{RelaxationSolver, RelaxationStatus};

/// Branch-and-bound tree controller of one worker.
///
/// Owns the node pool, the branching engine and the cutoff broker, and keeps
/// them consistent with the model across edits.
pub struct BranchAndBound {
    /// Frontier and solutions.
    pool: NodePool,

    /// Branching decisions and pseudocosts.
    branching: BranchingEngine,

    /// Cutoff owner.
    broker: BoundBroker,

    /// Settings.
    settings: BbSettings,

    /// Worker id (0 = leading worker).
    worker: usize,

    /// Node ids are `worker + k * id_stride`, unique across workers.
    id_stride: u64,
    next_node_id: u64,

    /// Nodes processed since the last reset.
    explored: u64,

    /// Nodes processed by the current `solve()`.
    processed_in_solve: u64,

    /// Start of the current `solve()`.
    start_time: Option<Instant>,

    /// Duration of the last `solve()` in seconds.
    solve_time: f64,

    /// Limit that ended the last `solve()`.
    stop_reason: Option<StopReason>,

    /// Combined impact of edits whose rebound was deferred.
    pending: Option<EditImpact>,

    /// Warnings raised while searching.
    warnings: Vec<String>,
}

impl BranchAndBound {
    /// Create a tree for a single worker.
    pub fn new(settings: BbSettings, model: &ProblemModel) -> Self {
        Self::for_worker(settings, model, 0, 1)
    }

    /// Create the tree of worker `worker` out of `num_workers`.
    pub fn for_worker(
        settings: BbSettings,
        model: &ProblemModel,
        worker: usize,
        num_workers: usize,
    ) -> Self {
        let mut tree = Self {
            pool: NodePool::new(),
            branching: BranchingEngine::new(model),
            broker: BoundBroker::new(settings.objective_cutoff),
            settings,
            worker,
            id_stride: num_workers.max(1) as u64,
            next_node_id: worker as u64,
            explored: 0,
            processed_in_solve: 0,
            start_time: None,
            solve_time: 0.0,
            stop_reason: None,
            pending: None,
            warnings: Vec::new(),
        };
        tree.restart(model);
        tree
    }

    // ---------------------------------------------------------------------
    // Accessors
    // ---------------------------------------------------------------------

    /// Frontier and solutions.
    pub fn pool(&self) -> &NodePool {
        &self.pool
    }

    /// Cutoff owner.
    pub fn broker(&self) -> &BoundBroker {
        &self.broker
    }

    /// Settings.
    pub fn settings(&self) -> &BbSettings {
        &self.settings
    }

    /// Worker id.
    pub fn worker(&self) -> usize {
        self.worker
    }

    /// Nodes processed since the last reset.
    pub fn explored(&self) -> u64 {
        self.explored
    }

    /// Duration of the last `solve()` in seconds.
    pub fn solve_time(&self) -> f64 {
        self.solve_time
    }

    /// Limit that ended the last `solve()`, if any.
    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stop_reason
    }

    /// True if edits are waiting for `update()`.
    pub fn has_pending_update(&self) -> bool {
        self.pending.is_some()
    }

    /// Take the warnings raised while searching.
    pub fn take_warnings(&mut self) -> Vec<String> {
        std::mem::take(&mut self.warnings)
    }

    /// Status of this worker's search.
    pub fn status(&self) -> SearchStatus {
        let obj_up_b = self
            .pool
            .best_solution()
            .map_or(f64::INFINITY, |s| s.objective);
        let frontier = (!self.pool.is_empty()).then(|| self.pool.lower_bound());
        BoundBroker::status(
            obj_up_b,
            frontier,
            self.explored,
            self.solve_time,
            self.stop_reason,
            &self.settings,
        )
    }

    // ---------------------------------------------------------------------
    // Lifecycle
    // ---------------------------------------------------------------------

    /// Discard solutions and active nodes, reinstate a root node.
    pub fn reset(&mut self, model: &ProblemModel) {
        self.pool.clear_solutions();
        self.pool.clear_unactive();
        self.broker.relearn(std::iter::empty());
        self.branching = BranchingEngine::new(model);
        self.explored = 0;
        self.stop_reason = None;
        self.pending = None;
        self.restart(model);
    }

    /// Discard all active nodes, keep the solutions.
    pub fn clear(&mut self) {
        self.pool.clear_nodes();
        self.stop_reason = None;
        self.pending = None;
    }

    /// Discard the processed-node bookkeeping and the solutions, keep the
    /// frontier.
    pub fn reset_explored_nodes(&mut self) {
        self.pool.clear_unactive();
        self.pool.clear_solutions();
        self.broker.relearn(std::iter::empty());
        self.explored = 0;
    }

    /// Replace the frontier with a fresh root node.
    ///
    /// Only the leading worker holds a root; the others wait for donations.
    fn restart(&mut self, model: &ProblemModel) {
        if self.worker == 0 {
            let root = self.make_root(model);
            self.pool.restart(root);
        } else {
            self.pool.clear_nodes();
        }
        self.stop_reason = None;
    }

    fn make_root(&mut self, model: &ProblemModel) -> SearchNode {
        let mut root = SearchNode::root(self.alloc_id());
        root.warm_start = model.initial_values().map(|v| v.to_vec());
        root
    }

    fn alloc_id(&mut self) -> u64 {
        let id = self.next_node_id;
        self.next_node_id += self.id_stride;
        id
    }

    /// Remove the whole frontier (for donation to other workers).
    pub fn take_frontier(&mut self) -> Vec<SearchNode> {
        self.pool.take_all()
    }

    /// Add donated nodes to the frontier.
    pub fn adopt(&mut self, nodes: Vec<SearchNode>) {
        for node in nodes {
            self.pool.push(node);
        }
    }

    // ---------------------------------------------------------------------
    // Edits
    // ---------------------------------------------------------------------

    /// Register a committed edit; rebound now or defer it to `update()`.
    pub fn note_edit<S: RelaxationSolver>(
        &mut self,
        model: &ProblemModel,
        subsolver: &mut S,
        impact: EditImpact,
        suppress_update: bool,
    ) -> BnbResult<()> {
        let combined = match self.pending.take() {
            Some(p) => p.combine(impact),
            None => impact,
        };
        if suppress_update {
            self.pending = Some(combined);
            Ok(())
        } else {
            self.rebound(model, subsolver, combined)
        }
    }

    /// Apply deferred edits.
    pub fn update<S: RelaxationSolver>(
        &mut self,
        model: &ProblemModel,
        subsolver: &mut S,
    ) -> BnbResult<()> {
        match self.pending.take() {
            Some(impact) => self.rebound(model, subsolver, impact),
            None => Ok(()),
        }
    }

    /// Replace the user cutoff and classify the change.
    pub fn set_objective_cutoff(&mut self, value: f64) -> EditImpact {
        if self.broker.set_user_cutoff(value) {
            EditImpact::Tightening
        } else {
            EditImpact::Loosening
        }
    }

    /// Make the frontier and the solutions consistent with an edited model.
    ///
    /// Every cached relaxation is dropped. Tightening edits keep the frontier
    /// in dynamic mode (re-relaxing it right away with `eager_rebound`),
    /// anything that can enlarge the feasible region restarts from the root.
    pub fn rebound<S: RelaxationSolver>(
        &mut self,
        model: &ProblemModel,
        subsolver: &mut S,
        impact: EditImpact,
    ) -> BnbResult<()> {
        self.branching.resize(model);
        match impact {
            EditImpact::Neutral => self.pool.invalidate_all(),
            EditImpact::Tightening => {
                let dropped = self.revalidate_solutions(model);
                if dropped > 0 || !self.settings.dynamic_mode {
                    self.restart(model);
                } else if self.settings.eager_rebound {
                    self.eager_rebound(model, subsolver)?;
                } else {
                    self.pool.invalidate_all();
                }
            }
            EditImpact::Loosening => {
                self.revalidate_solutions(model);
                self.restart(model);
            }
            EditImpact::Reshaped => {
                self.pool.clear_solutions();
                self.broker.relearn(std::iter::empty());
                self.restart(model);
            }
        }
        log::debug!(
            "worker {}: rebound after {:?} edit, {} active nodes",
            self.worker,
            impact,
            self.pool.num_active()
        );
        Ok(())
    }

    /// Drop solutions that are infeasible in the edited model and refresh
    /// the objectives of the others. Returns the number dropped.
    fn revalidate_solutions(&mut self, model: &ProblemModel) -> usize {
        let primal_tol = self.settings.primal_tolerance;
        let int_tol = self.settings.integer_tolerance;
        let dropped = self.pool.retain_solutions(|s| {
            if model.is_feasible(&s.point, primal_tol, int_tol) {
                s.objective = model.objective_value(&s.point);
                true
            } else {
                false
            }
        });
        let objectives: Vec<f64> = self.pool.solutions().iter().map(|s| s.objective).collect();
        self.broker.relearn(objectives);
        dropped
    }

    /// Re-relax every active node and prune the ones that became infeasible
    /// or dominated.
    ///
    /// On error the node being relaxed and the rest of the frontier go back
    /// to the pool with their relaxations dropped.
    fn eager_rebound<S: RelaxationSolver>(
        &mut self,
        model: &ProblemModel,
        subsolver: &mut S,
    ) -> BnbResult<()> {
        let cutoff = self.broker.cutoff();
        let tol = self.settings.objective_tolerance;

        let mut frontier = self.pool.take_all().into_iter();
        while let Some(mut node) = frontier.next() {
            node.invalidate();
            let (lower, upper) = node.bounds(model);
            let result =
                match subsolver.solve_relaxation(model, &lower, &upper, node.warm_start.as_deref()) {
                    Ok(result) => result,
                    Err(e) => {
                        self.requeue(std::iter::once(node).chain(frontier));
                        return Err(e);
                    }
                };
            match result.status {
                RelaxationStatus::Optimal => {
                    node.dual_bound = node.dual_bound.max(result.objective);
                    if node.can_prune(cutoff, tol) {
                        self.pool.retire(&mut node, NodeStatus::Pruned);
                        continue;
                    }
                    node.relaxation = Some(NodeRelaxation {
                        objective: result.objective,
                        primal: result.primal,
                    });
                    self.pool.push(node);
                }
                RelaxationStatus::Infeasible => self.pool.retire(&mut node, NodeStatus::Pruned),
                RelaxationStatus::Unbounded => {
                    let error = unbounded(&node);
                    self.requeue(std::iter::once(node).chain(frontier));
                    return Err(error);
                }
                // Left for the search loop to retry
                RelaxationStatus::IterationLimit | RelaxationStatus::NumericalError => {
                    self.pool.push(node)
                }
            }
        }
        Ok(())
    }

    /// Return nodes to the frontier without their cached relaxations.
    fn requeue(&mut self, nodes: impl Iterator<Item = SearchNode>) {
        for mut node in nodes {
            node.invalidate();
            self.pool.push(node);
        }
    }

    // ---------------------------------------------------------------------
    // Search
    // ---------------------------------------------------------------------

    /// Run the search until the frontier is exhausted or a stop condition
    /// fires.
    pub fn solve<S: RelaxationSolver>(
        &mut self,
        model: &ProblemModel,
        subsolver: &mut S,
        link: &mut dyn PeerLink,
    ) -> BnbResult<()> {
        self.begin_solve(model, subsolver)?;
        self.run(model, subsolver, link, None)?;
        self.end_solve(link);
        Ok(())
    }

    /// Apply deferred edits and start the clock and the per-solve counters.
    pub fn begin_solve<S: RelaxationSolver>(
        &mut self,
        model: &ProblemModel,
        subsolver: &mut S,
    ) -> BnbResult<()> {
        self.update(model, subsolver)?;
        self.start_time = Some(Instant::now());
        self.processed_in_solve = 0;
        self.stop_reason = None;
        Ok(())
    }

    /// Announce the end of the loop and log a summary.
    pub fn end_solve(&mut self, link: &mut dyn PeerLink) {
        self.solve_time = self.elapsed();
        link.finish(self.processed_in_solve);
        if self.settings.verbose {
            let status = self.status();
            log::info!(
                "Worker {} done: {:?} | Nodes: {} | Solutions: {} | Incumbent: {:.6e} | Bound: {:.6e} | Time: {:.3}s",
                self.worker,
                status.description,
                self.processed_in_solve,
                self.pool.num_solutions(),
                status.obj_up_b,
                status.obj_lo_b,
                self.solve_time,
            );
        }
    }

    /// Process nodes until the frontier is empty, a limit fires, or (with
    /// `target_active`) the frontier holds that many nodes.
    pub fn run<S: RelaxationSolver>(
        &mut self,
        model: &ProblemModel,
        subsolver: &mut S,
        link: &mut dyn PeerLink,
        target_active: Option<usize>,
    ) -> BnbResult<()> {
        loop {
            self.absorb_peers(link);

            if self.pool.is_empty() {
                break;
            }
            if target_active.map_or(false, |t| self.pool.num_active() >= t) {
                break;
            }
            if self.gap_closed() {
                break;
            }
            if let Some(reason) = self.check_limits() {
                self.stop_reason = Some(reason);
                break;
            }

            let node = match self.pool.pop() {
                Some(node) => node,
                None => break,
            };
            let accepted = self.process_node(model, subsolver, link, node)?;

            link.node_processed(self.broker.cutoff());
            self.log_progress();

            if accepted && self.settings.interactive_mode {
                self.stop_reason = Some(StopReason::Interactive);
                break;
            }
        }
        self.solve_time = self.elapsed();
        Ok(())
    }

    /// Relax one node and prune, accept or branch it.
    ///
    /// Returns true if the node produced a new solution.
    fn process_node<S: RelaxationSolver>(
        &mut self,
        model: &ProblemModel,
        subsolver: &mut S,
        link: &mut dyn PeerLink,
        mut node: SearchNode,
    ) -> BnbResult<bool> {
        self.explored += 1;
        self.processed_in_solve += 1;
        let tol = self.settings.objective_tolerance;
        let int_tol = self.settings.integer_tolerance;

        if node.can_prune(self.broker.cutoff(), tol) {
            self.pool.retire(&mut node, NodeStatus::Pruned);
            return Ok(false);
        }

        let (lower, upper) = node.bounds(model);
        let relaxation = match node.relaxation.take() {
            Some(r) => r,
            None => {
                let result = match subsolver.solve_relaxation(
                    model,
                    &lower,
                    &upper,
                    node.warm_start.as_deref(),
                ) {
                    Ok(result) => result,
                    Err(e) => {
                        self.unprocess(node);
                        return Err(e);
                    }
                };
                match result.status {
                    RelaxationStatus::Optimal => NodeRelaxation {
                        objective: result.objective,
                        primal: result.primal,
                    },
                    RelaxationStatus::Infeasible => {
                        self.pool.retire(&mut node, NodeStatus::Pruned);
                        return Ok(false);
                    }
                    RelaxationStatus::IterationLimit | RelaxationStatus::NumericalError => {
                        self.warn(format!(
                            "node {}: relaxation failed ({:?}), node pruned",
                            node.id, result.status
                        ));
                        self.pool.retire(&mut node, NodeStatus::Pruned);
                        return Ok(false);
                    }
                    RelaxationStatus::Unbounded => {
                        let error = unbounded(&node);
                        self.unprocess(node);
                        return Err(error);
                    }
                }
            }
        };

        if let Some(info) = node.branch_info.take() {
            self.branching.update_pseudocosts(&info, relaxation.objective);
        }
        node.dual_bound = node.dual_bound.max(relaxation.objective);

        if node.can_prune(self.broker.cutoff(), tol) {
            self.pool.retire(&mut node, NodeStatus::Pruned);
            return Ok(false);
        }

        if model.is_integer_feasible(&relaxation.primal, int_tol) {
            let solution = Solution {
                point: relaxation.primal,
                objective: relaxation.objective,
                node_id: node.id,
                worker: self.worker,
            };
            self.accept(solution, link);
            self.pool.retire(&mut node, NodeStatus::AcceptedSolution);
            return Ok(true);
        }

        let decision =
            self.branching
                .select(&relaxation.primal, model, &lower, &upper, int_tol);
        let parent_objective = relaxation.objective;
        node.relaxation = Some(relaxation);

        match decision {
            Some(BranchDecision::Sos1 { children, .. }) => {
                for changes in children {
                    let id = self.alloc_id();
                    let child = node.child(id, &changes, None);
                    self.pool.push(child);
                }
            }
            Some(BranchDecision::Variable {
                var,
                value,
                down_branch,
                up_branch,
                ..
            }) => {
                let (down_info, up_info) =
                    BranchingEngine::child_infos(var, value, parent_objective);
                for (change, info) in [(down_branch, down_info), (up_branch, up_info)] {
                    if change.is_infeasible() {
                        continue;
                    }
                    let id = self.alloc_id();
                    let child = node.child(id, &[change], Some(info));
                    self.pool.push(child);
                }
            }
            None => {}
        }

        node.relaxation = None;
        self.pool.retire(&mut node, NodeStatus::Branched);
        Ok(false)
    }

    /// Record a new solution, tighten the cutoff and tell the peers.
    fn accept(&mut self, solution: Solution, link: &mut dyn PeerLink) {
        self.broker.improve(solution.objective);
        let pruned = self
            .pool
            .prune_by_bound(self.broker.cutoff(), self.settings.objective_tolerance);

        if self.settings.verbose {
            log::info!(
                "Worker {}: new solution obj={:.6e} at node {}, pruned {} nodes",
                self.worker,
                solution.objective,
                solution.node_id,
                pruned
            );
        }

        link.publish(&solution);
        self.pool.add_solution(solution);
    }

    /// Fold peer cutoffs into the broker and prune.
    fn absorb_peers(&mut self, link: &mut dyn PeerLink) {
        if let Some(value) = link.poll() {
            self.absorb_cutoff(value);
        }
    }

    /// Fold an externally known objective into the cutoff.
    pub fn absorb_cutoff(&mut self, value: f64) {
        if self.broker.improve(value) {
            self.pool
                .prune_by_bound(self.broker.cutoff(), self.settings.objective_tolerance);
        }
    }

    fn gap_closed(&self) -> bool {
        let best = match self.pool.best_solution() {
            Some(s) => s.objective,
            None => return false,
        };
        let bound = self.pool.lower_bound();
        SearchStatus::compute_abs_gap(best, bound) <= self.settings.absolute_gap_tolerance
            || SearchStatus::compute_gap(best, bound) <= self.settings.relative_gap_tolerance
    }

    fn check_limits(&self) -> Option<StopReason> {
        if let Some(limit) = self.settings.time_limit {
            if self.elapsed() >= limit {
                return Some(StopReason::TimeLimit);
            }
        }
        if let Some(limit) = self.settings.iterations_limit {
            if self.processed_in_solve >= limit {
                return Some(StopReason::IterationsLimit);
            }
        }
        if let Some(limit) = self.settings.num_solutions_limit {
            if self.pool.num_solutions() >= limit {
                return Some(StopReason::SolutionsLimit);
            }
        }
        None
    }

    fn elapsed(&self) -> f64 {
        self.start_time
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    /// Undo the bookkeeping of a node whose relaxation could not be solved
    /// and put it back on the frontier.
    fn unprocess(&mut self, node: SearchNode) {
        self.explored -= 1;
        self.processed_in_solve -= 1;
        self.requeue(std::iter::once(node));
    }

    fn warn(&mut self, message: String) {
        log::warn!("worker {}: {}", self.worker, message);
        self.warnings.push(message);
    }

    /// Log progress (if verbose).
    fn log_progress(&self) {
        if !self.settings.verbose {
            return;
        }
        if self.processed_in_solve % self.settings.log_frequency.max(1) != 0 {
            return;
        }

        let best = self
            .pool
            .best_solution()
            .map_or(f64::INFINITY, |s| s.objective);
        log::info!(
            "Worker {} | Nodes: {} ({} open) | Bound: {:.6e} | Incumbent: {:.6e} | Gap: {:.2}% | Time: {:.1}s",
            self.worker,
            self.explored,
            self.pool.num_active(),
            self.pool.lower_bound(),
            best,
            SearchStatus::compute_gap(best, self.pool.lower_bound()) * 100.0,
            self.elapsed(),
        );
    }
}

fn unbounded(node: &SearchNode) -> BnbError {
    BnbError::Solver(format!("relaxation of node {} is unbounded", node.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordination::NoPeers;
    use crate::model::{
        ConstraintBlock, ObjectiveBlock, ProblemDefinition, StatusDescription, VariableBlock,
    };
    use crate::subsolver::RelaxationResult;

    /// Box-only QP solved in closed form: each coordinate of the unconstrained
    /// minimizer of `½ Σ (x_i - t_i)²` clamped to the node box.
    struct SeparableSolver {
        targets: Vec<f64>,
        calls: usize,
    }

    impl RelaxationSolver for SeparableSolver {
        fn name(&self) -> &'static str {
            "separable"
        }

        fn solve_relaxation(
            &mut self,
            model: &ProblemModel,
            lower: &[f64],
            upper: &[f64],
            _warm_start: Option<&[f64]>,
        ) -> BnbResult<RelaxationResult> {
            self.calls += 1;
            if lower.iter().zip(upper).any(|(l, u)| l > u) {
                return Ok(RelaxationResult::infeasible());
            }
            let primal: Vec<f64> = self
                .targets
                .iter()
                .zip(lower.iter().zip(upper))
                .map(|(&t, (&l, &u))| t.max(l).min(u))
                .collect();
            let objective = model.objective_value(&primal);
            Ok(RelaxationResult {
                status: RelaxationStatus::Optimal,
                dual: Vec::new(),
                reduced_costs: vec![0.0; primal.len()],
                primal,
                objective,
            })
        }
    }

    /// Reports every relaxation as unbounded.
    struct UnboundedSolver;

    impl RelaxationSolver for UnboundedSolver {
        fn name(&self) -> &'static str {
            "unbounded"
        }

        fn solve_relaxation(
            &mut self,
            _model: &ProblemModel,
            _lower: &[f64],
            _upper: &[f64],
            _warm_start: Option<&[f64]>,
        ) -> BnbResult<RelaxationResult> {
            Ok(RelaxationResult::failed(RelaxationStatus::Unbounded))
        }
    }

    /// min ½ Σ (x_i - t_i)² (constant dropped), x integer in [0, 4]
    fn separable(targets: &[f64]) -> (ProblemModel, SeparableSolver) {
        let n = targets.len();
        let mut q = vec![vec![0.0; n]; n];
        for (i, row) in q.iter_mut().enumerate() {
            row[i] = 1.0;
        }
        let model = ProblemModel::new(ProblemDefinition {
            objective: ObjectiveBlock::from_dense(&q, targets.iter().map(|t| -t).collect())
                .unwrap(),
            constraints: ConstraintBlock::empty(n),
            variables: VariableBlock::continuous(vec![0.0; n], vec![4.0; n])
                .with_discrete((0..n).collect()),
        })
        .unwrap();
        let solver = SeparableSolver {
            targets: targets.to_vec(),
            calls: 0,
        };
        (model, solver)
    }

    #[test]
    fn test_tree_initialization() {
        let (model, _) = separable(&[0.5]);
        let tree = BranchAndBound::new(BbSettings::default(), &model);
        assert_eq!(tree.pool().num_active(), 1);
        assert_eq!(tree.status().description, StatusDescription::Unknown);

        let peer = BranchAndBound::for_worker(BbSettings::default(), &model, 1, 2);
        assert!(peer.pool().is_empty());
    }

    #[test]
    fn test_solves_to_nearest_integers() {
        let (model, mut solver) = separable(&[1.3, 2.6]);
        let mut tree = BranchAndBound::new(BbSettings::default(), &model);
        tree.solve(&model, &mut solver, &mut NoPeers).unwrap();

        let status = tree.status();
        assert_eq!(status.description, StatusDescription::OptimalSolutionFound);
        let best = tree.pool().best_solution().unwrap();
        assert!((best.point[0] - 1.0).abs() < 1e-9);
        assert!((best.point[1] - 3.0).abs() < 1e-9);
        assert!(tree.explored() >= 3);
    }

    #[test]
    fn test_iterations_limit_reported() {
        let (model, mut solver) = separable(&[1.3, 2.6, 0.4]);
        let settings = BbSettings::default().with_iterations_limit(1);
        let mut tree = BranchAndBound::new(settings, &model);
        tree.solve(&model, &mut solver, &mut NoPeers).unwrap();

        assert_eq!(tree.stop_reason(), Some(StopReason::IterationsLimit));
        assert_eq!(tree.explored(), 1);
        assert_eq!(tree.status().description, StatusDescription::Unknown);
    }

    #[test]
    fn test_user_cutoff_prunes_everything() {
        let (model, mut solver) = separable(&[1.5]);
        let settings = BbSettings::default().with_objective_cutoff(-10.0);
        let mut tree = BranchAndBound::new(settings, &model);
        tree.solve(&model, &mut solver, &mut NoPeers).unwrap();
        assert_eq!(tree.status().description, StatusDescription::Infeasible);
    }

    #[test]
    fn test_interactive_mode_returns_per_solution() {
        let (model, mut solver) = separable(&[0.5]);
        let settings = BbSettings::default().with_interactive_mode(true);
        let mut tree = BranchAndBound::new(settings, &model);
        tree.solve(&model, &mut solver, &mut NoPeers).unwrap();

        // x = 0.5 ties between 0 and 1: the down child is accepted first
        assert_eq!(tree.stop_reason(), Some(StopReason::Interactive));
        assert_eq!(tree.pool().num_solutions(), 1);
    }

    #[test]
    fn test_reset_explored_nodes() {
        let (model, mut solver) = separable(&[1.3]);
        let mut tree = BranchAndBound::new(BbSettings::default().with_iterations_limit(2), &model);
        tree.solve(&model, &mut solver, &mut NoPeers).unwrap();
        let active = tree.pool().num_active();

        tree.reset_explored_nodes();
        assert_eq!(tree.pool().num_unactive(), 0);
        assert_eq!(tree.pool().num_solutions(), 0);
        assert_eq!(tree.pool().num_active(), active);
        assert_eq!(tree.status().obj_up_b, f64::INFINITY);
        assert_eq!(tree.broker().cutoff(), f64::INFINITY);
    }

    #[test]
    fn test_deferred_update() {
        let (mut model, mut solver) = separable(&[1.3]);
        let mut tree = BranchAndBound::new(BbSettings::default(), &model);
        tree.solve(&model, &mut solver, &mut NoPeers).unwrap();
        assert!(tree.pool().is_empty());

        let impact = model
            .update_bounds(&crate::model::BoundsUpdate::default().var_lower(vec![2.0]))
            .unwrap();
        tree.note_edit(&model, &mut solver, impact, true).unwrap();
        assert!(tree.has_pending_update());
        assert!(tree.pool().is_empty());

        tree.update(&model, &mut solver).unwrap();
        assert!(!tree.has_pending_update());
        // The old solution x = 1 is gone and the search restarted
        assert_eq!(tree.pool().num_solutions(), 0);
        assert_eq!(tree.pool().num_active(), 1);

        tree.solve(&model, &mut solver, &mut NoPeers).unwrap();
        let best = tree.pool().best_solution().unwrap();
        assert!((best.point[0] - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_eager_rebound_prunes_infeasible_frontier() {
        let (mut model, mut solver) = separable(&[1.5, 1.5]);
        let settings = BbSettings::default()
            .with_dynamic_mode(true)
            .with_eager_rebound(true)
            .with_iterations_limit(1);
        let mut tree = BranchAndBound::new(settings, &model);
        tree.solve(&model, &mut solver, &mut NoPeers).unwrap();
        // Root branched on x0: children x0 <= 1 and x0 >= 2
        assert_eq!(tree.pool().num_active(), 2);

        let calls = solver.calls;
        let impact = model
            .update_bounds(&crate::model::BoundsUpdate::default().var_upper(vec![1.0, 4.0]))
            .unwrap();
        assert_eq!(impact, EditImpact::Tightening);
        tree.note_edit(&model, &mut solver, impact, false).unwrap();

        // Both re-relaxed, the x0 >= 2 child is now empty
        assert_eq!(solver.calls, calls + 2);
        assert_eq!(tree.pool().num_active(), 1);
        assert!(tree.pool().best_node().unwrap().relaxation.is_some());
    }

    #[test]
    fn test_unbounded_relaxation_keeps_node() {
        let (model, _) = separable(&[1.5]);
        let mut tree = BranchAndBound::new(BbSettings::default(), &model);

        let result = tree.solve(&model, &mut UnboundedSolver, &mut NoPeers);
        assert!(matches!(result, Err(BnbError::Solver(_))));
        assert_eq!(tree.pool().num_active(), 1);
        assert_eq!(tree.explored(), 0);
        assert_eq!(tree.status().description, StatusDescription::Unknown);
    }

    #[test]
    fn test_unbounded_rebound_keeps_frontier() {
        let (mut model, mut solver) = separable(&[1.5, 1.5]);
        let settings = BbSettings::default()
            .with_dynamic_mode(true)
            .with_eager_rebound(true)
            .with_iterations_limit(1);
        let mut tree = BranchAndBound::new(settings, &model);
        tree.solve(&model, &mut solver, &mut NoPeers).unwrap();
        assert_eq!(tree.pool().num_active(), 2);

        let impact = model
            .update_bounds(&crate::model::BoundsUpdate::default().var_upper(vec![4.0, 3.0]))
            .unwrap();
        assert_eq!(impact, EditImpact::Tightening);
        let result = tree.note_edit(&model, &mut UnboundedSolver, impact, false);

        assert!(matches!(result, Err(BnbError::Solver(_))));
        assert_eq!(tree.pool().num_active(), 2);
        assert!(tree.pool().best_node().unwrap().relaxation.is_none());
        assert_eq!(tree.status().description, StatusDescription::Unknown);
    }
}
