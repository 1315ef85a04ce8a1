//! Workspace: the mutable problem, its search trees and subsolvers.
//!
//! A workspace owns one worker per configured process. Each worker holds a
//! model copy, a branch-and-bound tree and a subsolver instance. Worker 0
//! is the leading worker: `local_only` calls act on it alone, and it seeds
//! the other workers' frontiers at the start of a distributed solve.

use serde_json::Value;

use crate::coordination::{ChannelTransport, GlobalView, NoPeers, WorkerCoordinator};
use crate::error::{BnbError, BnbResult};
use crate::model::{
    BoundsUpdate, ConstraintBlock, EditImpact, ObjectiveBlock, ProblemDefinition, ProblemModel,
    SearchStatus, Solution, VariableBlock,
};
use crate::search::{BoundBroker, BranchAndBound, SearchNode};
use crate::settings::{Settings, SubsolverSettings};
use crate::subsolver::{RelaxationSolver, Subsolver};

/// Per-call flags of an edit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EditOptions {
    /// Do not record warnings raised by this call.
    pub suppress_warnings: bool,

    /// Defer the rebound of the search tree until `update()` or `solve()`.
    pub suppress_update: bool,

    /// Apply the edit to the leading worker only.
    pub local_only: bool,
}

impl EditOptions {
    /// Defer the rebound.
    pub fn deferred() -> Self {
        Self {
            suppress_update: true,
            ..Self::default()
        }
    }

    /// Apply to the leading worker only.
    pub fn local() -> Self {
        Self {
            local_only: true,
            ..Self::default()
        }
    }

    /// Set `suppress_warnings`.
    pub fn with_suppress_warnings(mut self, on: bool) -> Self {
        self.suppress_warnings = on;
        self
    }
}

/// Result of a worker thread and its coordinator (`None` if it panicked).
type WorkerOutcome = (BnbResult<()>, Option<WorkerCoordinator<ChannelTransport>>);

struct Worker {
    model: ProblemModel,
    tree: BranchAndBound,
    subsolver: Subsolver,
}

/// Branch-and-bound workspace.
pub struct Workspace {
    settings: Settings,
    workers: Vec<Worker>,
    warnings: Vec<String>,
}

impl Workspace {
    /// Build a workspace from a problem and settings.
    ///
    /// All blocks of a supplied problem are validated before anything is
    /// built. Without a problem the workspace starts empty (no variables, no
    /// constraints) and is populated with [`Workspace::append_problem`].
    pub fn setup(problem: Option<ProblemDefinition>, settings: Settings) -> BnbResult<Self> {
        let model = ProblemModel::new(problem.unwrap_or_else(ProblemDefinition::empty))?;

        let num_workers = settings.bb.worker_count();
        let mut workers = Vec::with_capacity(num_workers);
        for w in 0..num_workers {
            workers.push(Worker {
                tree: BranchAndBound::for_worker(settings.bb.clone(), &model, w, num_workers),
                subsolver: Subsolver::new(&settings.subsolver)?,
                model: model.clone(),
            });
        }

        if settings.bb.verbose {
            log::info!(
                "Workspace: {} variables ({} discrete), {} constraints, subsolver {}, {} worker(s)",
                model.num_vars(),
                model.num_discrete(),
                model.num_constraints(),
                settings.subsolver.name(),
                num_workers
            );
        }

        Ok(Self {
            settings,
            workers,
            warnings: Vec::new(),
        })
    }

    /// Build a workspace from a flat option object (see
    /// [`Settings::from_options`]). Unrecognized keys become warnings.
    pub fn setup_with_options(problem: Option<ProblemDefinition>, options: &Value) -> BnbResult<Self> {
        let (settings, warnings) = Settings::from_json(options)?;
        let mut ws = Self::setup(problem, settings)?;
        ws.record_warnings(warnings, false);
        Ok(ws)
    }

    /// Warnings recorded so far.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Take the recorded warnings.
    pub fn take_warnings(&mut self) -> Vec<String> {
        std::mem::take(&mut self.warnings)
    }

    fn record_warnings(&mut self, messages: Vec<String>, suppress: bool) {
        if suppress {
            return;
        }
        for message in messages {
            log::warn!("{}", message);
            self.warnings.push(message);
        }
    }

    /// Move warnings raised inside the trees to the workspace list.
    fn collect_tree_warnings(&mut self, suppress: bool) {
        for worker in &mut self.workers {
            let messages = worker.tree.take_warnings();
            if !suppress {
                self.warnings.extend(messages);
            }
        }
    }

    fn leader(&self) -> &Worker {
        &self.workers[0]
    }

    fn scope(&self, local_only: bool) -> &[Worker] {
        if local_only {
            &self.workers[..1]
        } else {
            &self.workers
        }
    }

    // ---------------------------------------------------------------------
    // Inspection
    // ---------------------------------------------------------------------

    /// The model of the leading worker.
    pub fn model(&self) -> &ProblemModel {
        &self.leader().model
    }

    /// Search status.
    pub fn get_status(&self, local_only: bool) -> SearchStatus {
        if local_only || self.workers.len() == 1 {
            return self.leader().tree.status();
        }

        let obj_up_b = self
            .get_best_solution(false)
            .map_or(f64::INFINITY, |s| s.objective);
        let frontier = self
            .workers
            .iter()
            .filter(|w| !w.tree.pool().is_empty())
            .map(|w| w.tree.pool().lower_bound())
            .reduce(f64::min);
        let explored = self.workers.iter().map(|w| w.tree.explored()).sum();
        let solve_time = self
            .workers
            .iter()
            .map(|w| w.tree.solve_time())
            .fold(0.0, f64::max);
        let stop_reason = self.workers.iter().find_map(|w| w.tree.stop_reason());

        BoundBroker::status(
            obj_up_b,
            frontier,
            explored,
            solve_time,
            stop_reason,
            &self.settings.bb,
        )
    }

    /// Best solution (lowest objective, earliest on ties).
    pub fn get_best_solution(&self, local_only: bool) -> Option<&Solution> {
        self.scope(local_only)
            .iter()
            .filter_map(|w| w.tree.pool().best_solution())
            .reduce(|best, s| if s.objective < best.objective { s } else { best })
    }

    /// All accepted solutions, worker by worker in acceptance order.
    pub fn get_all_solutions(&self, local_only: bool) -> Vec<Solution> {
        self.scope(local_only)
            .iter()
            .flat_map(|w| w.tree.pool().solutions().iter().cloned())
            .collect()
    }

    /// The active node with the lowest bound.
    pub fn get_best_node(&self, local_only: bool) -> Option<&SearchNode> {
        self.scope(local_only)
            .iter()
            .filter_map(|w| w.tree.pool().best_node())
            .reduce(|best, n| if n.dual_bound < best.dual_bound { n } else { best })
    }

    /// Number of variables.
    pub fn get_num_variables(&self) -> usize {
        self.model().num_vars()
    }

    /// Number of constraints.
    pub fn get_num_constraints(&self) -> usize {
        self.model().num_constraints()
    }

    /// Number of discrete variables.
    pub fn get_num_discrete_variables(&self) -> usize {
        self.model().num_discrete()
    }

    /// Constraint matrix and bounds.
    pub fn get_constraints(&self) -> ConstraintBlock {
        let model = self.model();
        ConstraintBlock {
            matrix: model.constraint_matrix().clone(),
            lower: model.cns_lower().to_vec(),
            upper: model.cns_upper().to_vec(),
        }
    }

    /// Objective terms.
    pub fn get_objective(&self) -> ObjectiveBlock {
        let model = self.model();
        ObjectiveBlock {
            quadratic: model.quadratic().cloned(),
            linear: model.linear().to_vec(),
        }
    }

    /// Column indices of the nonzeros of every constraint row.
    pub fn get_constraints_sparsity(&self) -> Vec<Vec<usize>> {
        self.model().constraints_sparsity()
    }

    /// Column indices of the nonzeros of one constraint row.
    pub fn get_constraint_sparsity(&self, index: usize) -> BnbResult<Vec<usize>> {
        self.model().constraint_sparsity(index)
    }

    /// Column indices of the nonzeros of every row of Q.
    pub fn get_objective_sparsity(&self) -> Vec<Vec<usize>> {
        self.model().objective_sparsity()
    }

    /// Variable bounds `(lower, upper)`.
    pub fn get_variable_bounds(&self) -> (Vec<f64>, Vec<f64>) {
        let model = self.model();
        (model.var_lower().to_vec(), model.var_upper().to_vec())
    }

    /// Constraint bounds `(lower, upper)`.
    pub fn get_constraint_bounds(&self) -> (Vec<f64>, Vec<f64>) {
        let model = self.model();
        (model.cns_lower().to_vec(), model.cns_upper().to_vec())
    }

    /// Number of active (unexplored) nodes.
    pub fn get_num_active_nodes(&self, local_only: bool) -> usize {
        self.scope(local_only)
            .iter()
            .map(|w| w.tree.pool().num_active())
            .sum()
    }

    /// Number of processed or pruned nodes.
    pub fn get_num_unactive_nodes(&self, local_only: bool) -> u64 {
        self.scope(local_only)
            .iter()
            .map(|w| w.tree.pool().num_unactive())
            .sum()
    }

    /// Number of accepted solutions.
    pub fn get_num_solutions(&self, local_only: bool) -> usize {
        self.scope(local_only)
            .iter()
            .map(|w| w.tree.pool().num_solutions())
            .sum()
    }

    /// Settings the workspace was built with.
    pub fn get_settings(&self) -> &Settings {
        &self.settings
    }

    /// Name of the subsolver.
    pub fn get_subsolver_name(&self) -> &'static str {
        self.leader().subsolver.name()
    }

    /// Settings of the subsolver.
    pub fn get_subsolver_settings(&self) -> &SubsolverSettings {
        &self.settings.subsolver
    }

    // ---------------------------------------------------------------------
    // Edits
    // ---------------------------------------------------------------------

    /// Apply an edit to the target workers and rebound their trees.
    ///
    /// Worker models may differ after local edits, so the edit is staged on
    /// a copy of every target model and committed only if all of them accept
    /// it. Trees are rebounded after the commit.
    fn edit<F>(&mut self, options: EditOptions, mut apply: F) -> BnbResult<()>
    where
        F: FnMut(&mut ProblemModel) -> BnbResult<EditImpact>,
    {
        let targets = if options.local_only { 1 } else { self.workers.len() };

        let impacts = if targets == 1 {
            // A single model edit is already atomic
            vec![apply(&mut self.workers[0].model)?]
        } else {
            let mut staged = Vec::with_capacity(targets);
            for worker in &self.workers[..targets] {
                let mut model = worker.model.clone();
                let impact = apply(&mut model)?;
                staged.push((model, impact));
            }
            staged
                .into_iter()
                .zip(&mut self.workers)
                .map(|((model, impact), worker)| {
                    worker.model = model;
                    impact
                })
                .collect()
        };

        for (worker, impact) in self.workers.iter_mut().zip(impacts) {
            worker.tree.note_edit(
                &worker.model,
                &mut worker.subsolver,
                impact,
                options.suppress_update,
            )?;
        }

        if options.local_only && self.workers.len() > 1 {
            self.record_warnings(
                vec!["local edit: worker models now differ".to_string()],
                options.suppress_warnings,
            );
        }
        self.collect_tree_warnings(options.suppress_warnings);
        Ok(())
    }

    /// Append constraints at the end.
    pub fn append_constraints(&mut self, block: ConstraintBlock, options: EditOptions) -> BnbResult<()> {
        self.edit(options, |m| m.append_constraints(block.clone()))
    }

    /// Insert constraints so the first new row lands at `index`.
    pub fn insert_constraints_at(
        &mut self,
        index: usize,
        block: ConstraintBlock,
        options: EditOptions,
    ) -> BnbResult<()> {
        self.edit(options, |m| m.insert_constraints_at(index, block.clone()))
    }

    /// Remove constraints.
    pub fn remove_constraints(&mut self, indices: &[usize], options: EditOptions) -> BnbResult<()> {
        self.edit(options, |m| m.remove_constraints(indices))
    }

    /// Reorder constraints: new row `k` is old row `permutation[k]`.
    pub fn permute_constraints(&mut self, permutation: &[usize], options: EditOptions) -> BnbResult<()> {
        self.edit(options, |m| m.permute_constraints(permutation))
    }

    /// Replace some of the bound vectors.
    pub fn update_bounds(&mut self, update: &BoundsUpdate, options: EditOptions) -> BnbResult<()> {
        self.edit(options, |m| m.update_bounds(update))
    }

    /// Replace the objective.
    pub fn set_objective(&mut self, block: ObjectiveBlock, options: EditOptions) -> BnbResult<()> {
        self.edit(options, |m| m.set_objective(block.clone()))
    }

    /// Replace the whole constraint set.
    pub fn set_constraint_set(&mut self, block: ConstraintBlock, options: EditOptions) -> BnbResult<()> {
        self.edit(options, |m| m.set_constraint_set(block.clone()))
    }

    /// Extend the problem with new variables, constraints and objective
    /// terms, atomically.
    pub fn append_problem(
        &mut self,
        variables: VariableBlock,
        constraints: ConstraintBlock,
        objective: ObjectiveBlock,
        options: EditOptions,
    ) -> BnbResult<()> {
        self.edit(options, |m| {
            m.append_problem(variables.clone(), constraints.clone(), objective.clone())
        })
    }

    /// Mark variables discrete, optionally assigning SOS1 groups.
    pub fn integralize_variables(
        &mut self,
        indices: &[usize],
        sos1_groups: Option<&[usize]>,
        options: EditOptions,
    ) -> BnbResult<()> {
        self.edit(options, |m| m.integralize_variables(indices, sos1_groups))
    }

    /// Replace the user objective cutoff.
    pub fn update_objective_cutoff(&mut self, value: f64, options: EditOptions) -> BnbResult<()> {
        if value.is_nan() {
            return Err(BnbError::Validation("objective cutoff is NaN".to_string()));
        }
        let targets = if options.local_only { 1 } else { self.workers.len() };
        for worker in &mut self.workers[..targets] {
            let impact = worker.tree.set_objective_cutoff(value);
            worker.tree.note_edit(
                &worker.model,
                &mut worker.subsolver,
                impact,
                options.suppress_update,
            )?;
        }
        self.collect_tree_warnings(options.suppress_warnings);
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Lifecycle
    // ---------------------------------------------------------------------

    /// Apply rebounds deferred by `suppress_update` edits.
    pub fn update(&mut self, local_only: bool) -> BnbResult<()> {
        let targets = if local_only { 1 } else { self.workers.len() };
        for worker in &mut self.workers[..targets] {
            worker.tree.update(&worker.model, &mut worker.subsolver)?;
        }
        self.collect_tree_warnings(false);
        Ok(())
    }

    /// Discard solutions and active nodes and start again from the root.
    pub fn reset(&mut self, local_only: bool) {
        let targets = if local_only { 1 } else { self.workers.len() };
        for worker in &mut self.workers[..targets] {
            worker.tree.reset(&worker.model);
        }
    }

    /// Discard all active nodes, keep the solutions.
    pub fn clear(&mut self, local_only: bool) {
        let targets = if local_only { 1 } else { self.workers.len() };
        for worker in &mut self.workers[..targets] {
            worker.tree.clear();
        }
    }

    /// Discard processed-node bookkeeping and solutions, keep the frontier.
    pub fn reset_explored_nodes(&mut self, local_only: bool) {
        let targets = if local_only { 1 } else { self.workers.len() };
        for worker in &mut self.workers[..targets] {
            worker.tree.reset_explored_nodes();
        }
    }

    // ---------------------------------------------------------------------
    // Solve
    // ---------------------------------------------------------------------

    /// Run branch and bound until the frontier is exhausted or a limit
    /// fires; inspect the outcome with [`Workspace::get_status`].
    pub fn solve(&mut self) -> BnbResult<()> {
        let result = if self.workers.len() == 1 {
            let worker = &mut self.workers[0];
            worker
                .tree
                .solve(&worker.model, &mut worker.subsolver, &mut NoPeers)
        } else {
            self.solve_distributed()
        };
        self.collect_tree_warnings(false);
        result
    }

    fn solve_distributed(&mut self) -> BnbResult<()> {
        let num_workers = self.workers.len();
        for worker in &mut self.workers {
            worker.tree.begin_solve(&worker.model, &mut worker.subsolver)?;
        }

        // Expand on the leading worker until every idle peer can get a node
        let idle: Vec<usize> = (1..num_workers)
            .filter(|&w| self.workers[w].tree.pool().is_empty())
            .collect();
        if !idle.is_empty() {
            let lead = &mut self.workers[0];
            lead.tree.run(
                &lead.model,
                &mut lead.subsolver,
                &mut NoPeers,
                Some(idle.len() + 1),
            )?;
            self.donate(&idle);
        }

        let cutoff = self.global_cutoff();
        for worker in &mut self.workers {
            worker.tree.absorb_cutoff(cutoff);
        }

        if self.leader().tree.stop_reason().is_some() {
            for worker in &mut self.workers {
                worker.tree.end_solve(&mut NoPeers);
            }
            return Ok(());
        }

        let sync_frequency = self.settings.bb.sync_frequency;
        let transports = ChannelTransport::mesh(num_workers);
        let outcomes: Vec<WorkerOutcome> = std::thread::scope(|scope| {
            let handles: Vec<_> = self
                .workers
                .iter_mut()
                .zip(transports)
                .map(|(worker, transport)| {
                    scope.spawn(move || {
                        let mut link = WorkerCoordinator::new(transport, sync_frequency);
                        let result =
                            worker
                                .tree
                                .run(&worker.model, &mut worker.subsolver, &mut link, None);
                        worker.tree.end_solve(&mut link);
                        (result, link)
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| match h.join() {
                    Ok((result, link)) => (result, Some(link)),
                    Err(_) => (
                        Err(BnbError::Solver("worker thread panicked".to_string())),
                        None,
                    ),
                })
                .collect()
        });

        // Every thread has joined, so the drained views hold all broadcasts
        let mut view = GlobalView::default();
        let mut results = Vec::with_capacity(outcomes.len());
        for (result, link) in outcomes {
            if let Some(link) = link {
                view.absorb(link.into_view());
            }
            results.push(result);
        }
        if let Some(cutoff) = view.cutoff {
            for worker in &mut self.workers {
                worker.tree.absorb_cutoff(cutoff);
            }
        }

        if self.settings.bb.verbose {
            for (w, explored) in &view.finished {
                log::info!("Worker {}: {} node(s) processed", w, explored);
            }
            if let Some(ref best) = view.best_solution {
                log::info!(
                    "Incumbent {:.6e} found by worker {} at node {}",
                    best.objective,
                    best.worker,
                    best.node_id
                );
            }
            let status = self.get_status(false);
            log::info!(
                "Distributed solve: {:?} | Nodes: {} | Solutions: {} | Incumbent: {:.6e} | Bound: {:.6e}",
                status.description,
                status.explored_nodes,
                self.get_num_solutions(false),
                status.obj_up_b,
                status.obj_lo_b,
            );
        }

        results.into_iter().collect()
    }

    /// Hand out the leading worker's frontier round-robin to itself and the
    /// idle peers; the leader keeps the best node.
    fn donate(&mut self, idle: &[usize]) {
        let frontier = self.workers[0].tree.take_frontier();
        let mut recipients: Vec<usize> = vec![0];
        recipients.extend_from_slice(idle);

        let mut shares: Vec<Vec<SearchNode>> = vec![Vec::new(); recipients.len()];
        for (k, mut node) in frontier.into_iter().enumerate() {
            node.invalidate();
            shares[k % recipients.len()].push(node);
        }

        for (&w, share) in recipients.iter().zip(shares) {
            if self.settings.bb.verbose && w != 0 {
                log::info!("Worker 0: donated {} node(s) to worker {}", share.len(), w);
            }
            self.workers[w].tree.adopt(share);
        }
    }

    fn global_cutoff(&self) -> f64 {
        self.workers
            .iter()
            .map(|w| w.tree.broker().cutoff())
            .fold(f64::INFINITY, f64::min)
    }
}
