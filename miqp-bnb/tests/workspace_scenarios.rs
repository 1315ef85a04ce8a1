//! End-to-end scenarios on the workspace API with the Clarabel backend.

use miqp_bnb::{
    BbSettings, BnbError, BoundsUpdate, ConstraintBlock, EditOptions, ObjectiveBlock,
    ProblemDefinition, Settings, StatusDescription, VariableBlock, Workspace,
};
use serde_json::json;

/// Five variables, two equality constraints, x1..x3 binary in one SOS1 set:
///
/// min  x0² + x1² + x3² + x4²
/// s.t. x0 + x1 - x3 - x4 = 0
///      x1 + x2 + x3      = 1
///      x0 = 0.5, x4 in [-10, 10], x1, x2, x3 in {0, 1}, at most one nonzero
///
/// Picking x2 = 1 gives x4 = 0.5 and the optimum 0.5.
fn sos1_scenario() -> ProblemDefinition {
    let mut q = vec![vec![0.0; 5]; 5];
    for (i, row) in q.iter_mut().enumerate() {
        row[i] = 2.0;
    }
    q[2][2] = 0.0;

    ProblemDefinition {
        objective: ObjectiveBlock::from_dense(&q, vec![0.0; 5]).unwrap(),
        constraints: ConstraintBlock::from_dense(
            &[
                vec![1.0, 1.0, 0.0, -1.0, -1.0],
                vec![0.0, 1.0, 1.0, 1.0, 0.0],
            ],
            vec![0.0, 1.0],
            vec![0.0, 1.0],
        )
        .unwrap(),
        variables: VariableBlock::continuous(
            vec![0.5, 0.0, 0.0, 0.0, -10.0],
            vec![0.5, 1.0, 1.0, 1.0, 10.0],
        )
        .with_values(vec![0.5, 0.0, 1.0, 0.0, 0.5])
        .with_discrete(vec![1, 2, 3])
        .with_sos1_groups(vec![1, 1, 1]),
    }
}

fn solved_workspace() -> Workspace {
    let mut ws = Workspace::setup(Some(sos1_scenario()), Settings::default()).unwrap();
    ws.solve().unwrap();
    ws
}

#[test]
fn test_sos1_scenario_optimum() {
    let ws = solved_workspace();
    assert_eq!(ws.get_num_variables(), 5);
    assert_eq!(ws.get_num_constraints(), 2);
    assert_eq!(ws.get_num_discrete_variables(), 3);

    let status = ws.get_status(false);
    assert_eq!(status.description, StatusDescription::OptimalSolutionFound);

    let tol = ws.get_settings().bb.primal_tolerance;
    let best = ws.get_best_solution(false).unwrap();
    assert!(
        (best.objective - 0.5).abs() <= tol,
        "objective {}",
        best.objective
    );
    assert!((best.point[2] - 1.0).abs() <= tol);
    assert!((best.point[4] - 0.5).abs() <= tol);
    assert!((status.obj_up_b - 0.5).abs() <= tol);
}

#[test]
fn test_reset_explored_nodes_scenario() {
    let mut ws = solved_workspace();
    assert!(ws.get_num_solutions(false) > 0);

    ws.reset_explored_nodes(false);
    assert_eq!(ws.get_num_unactive_nodes(false), 0);
    assert_eq!(ws.get_num_solutions(false), 0);
    assert_eq!(ws.get_status(false).obj_up_b, f64::INFINITY);
}

#[test]
fn test_tightened_lower_bound_makes_problem_infeasible() {
    let mut ws = solved_workspace();

    // x4 >= 2 forces x1 - x3 >= 1.5, out of reach for binaries
    let (mut lower, _) = ws.get_variable_bounds();
    lower[4] = 2.0;
    ws.update_bounds(
        &BoundsUpdate::default().var_lower(lower),
        EditOptions::default(),
    )
    .unwrap();
    ws.solve().unwrap();

    assert_eq!(ws.get_status(false).description, StatusDescription::Infeasible);
    assert_eq!(ws.get_num_solutions(false), 0);
}

#[test]
fn test_append_problem_does_not_improve_objective() {
    let mut ws = solved_workspace();
    let before = ws.get_best_solution(false).unwrap().objective;

    // New x5 in [0, 2] with x4 + x5 >= 1 and objective term x5²
    let mut q = vec![vec![0.0; 6]; 6];
    q[5][5] = 2.0;
    let objective = ObjectiveBlock::from_dense(&q, vec![0.0; 6]).unwrap();
    let constraints = ConstraintBlock::from_dense(
        &[vec![0.0, 0.0, 0.0, 0.0, 1.0, 1.0]],
        vec![1.0],
        vec![f64::INFINITY],
    )
    .unwrap();
    let variables = VariableBlock::continuous(vec![0.0], vec![2.0]);

    ws.append_problem(variables, constraints, objective, EditOptions::default())
        .unwrap();
    assert_eq!(ws.get_num_variables(), 6);
    assert_eq!(ws.get_num_constraints(), 3);
    // Solutions of the old space are gone
    assert_eq!(ws.get_num_solutions(false), 0);

    ws.solve().unwrap();
    let status = ws.get_status(false);
    assert_eq!(status.description, StatusDescription::OptimalSolutionFound);
    let after = ws.get_best_solution(false).unwrap().objective;
    assert!(after >= before - ws.get_settings().bb.primal_tolerance);
    // x2 = 1, x4 = 0.5, x5 = 0.5
    assert!((after - 0.75).abs() <= 1e-3, "objective {}", after);
}

#[test]
fn test_deferred_edits_batch_into_one_rebound() {
    let mut ws = solved_workspace();

    // Forbid x2: the SOS1 choice moves to x3 (x4 = -0.5, objective 1.5)
    let (lower, mut upper) = ws.get_variable_bounds();
    upper[2] = 0.0;
    ws.update_bounds(
        &BoundsUpdate::default().var_upper(upper.clone()),
        EditOptions::deferred(),
    )
    .unwrap();
    // Nothing happened to the search yet
    assert_eq!(ws.get_num_solutions(false), 1);

    ws.update_bounds(
        &BoundsUpdate::default().var_lower(lower).var_upper(upper),
        EditOptions::deferred(),
    )
    .unwrap();
    ws.solve().unwrap();

    let best = ws.get_best_solution(false).unwrap();
    assert!(best.point[2].abs() <= 1e-4);
    assert!((best.objective - 1.5).abs() <= 1e-3, "objective {}", best.objective);
}

#[test]
fn test_interactive_mode_returns_after_each_solution() {
    let settings = Settings::new(BbSettings::default().with_interactive_mode(true));
    let mut ws = Workspace::setup(Some(sos1_scenario()), settings).unwrap();

    let mut rounds = 0;
    loop {
        let found = ws.get_num_solutions(false);
        ws.solve().unwrap();
        rounds += 1;
        if ws.get_num_active_nodes(false) == 0 || rounds > 20 {
            break;
        }
        assert!(ws.get_num_solutions(false) > found);
    }
    assert_eq!(
        ws.get_status(false).description,
        StatusDescription::OptimalSolutionFound
    );
}

#[test]
fn test_iterations_limit_stops_early() {
    let settings = Settings::new(BbSettings::default().with_iterations_limit(0));
    let mut ws = Workspace::setup(Some(sos1_scenario()), settings).unwrap();
    ws.solve().unwrap();

    let status = ws.get_status(false);
    assert_eq!(status.description, StatusDescription::Unknown);
    assert_eq!(status.explored_nodes, 0);
    assert_eq!(ws.get_num_active_nodes(false), 1);
}

#[test]
fn test_setup_options_and_warnings() {
    let ws = Workspace::setup_with_options(
        Some(sos1_scenario()),
        &json!({
            "subsolver": "clarabel",
            "verbose": false,
            "iterationsLimit": 1000,
            "clarabel.maxIter": 100,
            "clarabel.unknownKnob": 3,
            "notAnOption": true,
        }),
    )
    .unwrap();
    assert_eq!(ws.get_subsolver_name(), "clarabel");
    assert_eq!(ws.get_settings().bb.iterations_limit, Some(1000));
    assert_eq!(ws.warnings().len(), 2);
}

#[test]
fn test_setup_errors() {
    let missing = Workspace::setup_with_options(Some(sos1_scenario()), &json!({"verbose": true}));
    assert!(matches!(missing, Err(BnbError::Configuration(_))));

    let unknown = Workspace::setup_with_options(Some(sos1_scenario()), &json!({"subsolver": "nope"}));
    assert!(matches!(unknown, Err(BnbError::Configuration(_))));

    let empty = Workspace::setup_with_options(None, &json!({"subsolver": "clarabel"})).unwrap();
    assert_eq!(empty.get_num_variables(), 0);
    assert_eq!(empty.get_num_active_nodes(false), 1);

    let mut bad = sos1_scenario();
    bad.variables.discrete = vec![1, 7, 3];
    let bad = Workspace::setup(Some(bad), Settings::default());
    assert!(matches!(bad, Err(BnbError::Index(_))));
}

#[test]
fn test_inspection_getters() {
    let ws = solved_workspace();

    let constraints = ws.get_constraints();
    assert_eq!(constraints.num_rows(), 2);
    assert_eq!(ws.get_constraints_sparsity(), vec![vec![0, 1, 3, 4], vec![1, 2, 3]]);
    assert_eq!(ws.get_constraint_sparsity(1).unwrap(), vec![1, 2, 3]);
    assert!(matches!(ws.get_constraint_sparsity(2), Err(BnbError::Index(_))));
    assert_eq!(
        ws.get_objective_sparsity(),
        vec![vec![0], vec![1], vec![], vec![3], vec![4]]
    );
    assert_eq!(ws.get_objective().linear, vec![0.0; 5]);
    assert_eq!(ws.get_constraint_bounds(), (vec![0.0, 1.0], vec![0.0, 1.0]));

    let solutions = ws.get_all_solutions(false);
    assert_eq!(solutions.len(), ws.get_num_solutions(false));
    assert!(ws.get_best_node(false).is_none());
}
