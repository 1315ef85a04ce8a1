//! Property-based tests for the structural edits of the problem model.

use miqp_bnb::model::sparse::SparseRow;
use miqp_bnb::settings::ClarabelSettings;
use miqp_bnb::subsolver::{ClarabelBackend, RelaxationSolver, RelaxationStatus};
use miqp_bnb::{
    BnbError, BoundsUpdate, ConstraintBlock, IndexBase, ObjectiveBlock, ProblemDefinition,
    ProblemModel, VariableBlock,
};
use proptest::prelude::*;

const NUM_VARS: usize = 3;

/// Strategy for dense constraint rows with small integer coefficients
fn rows_strategy() -> impl Strategy<Value = Vec<Vec<f64>>> {
    prop::collection::vec(
        prop::collection::vec((-3i32..=3).prop_map(f64::from), NUM_VARS),
        1..8,
    )
}

fn build_model(rows: &[Vec<f64>]) -> ProblemModel {
    let m = rows.len();
    let lower: Vec<f64> = (0..m).map(|k| -(k as f64) - 1.0).collect();
    let upper: Vec<f64> = (0..m).map(|k| k as f64 + 1.0).collect();
    ProblemModel::new(ProblemDefinition {
        objective: ObjectiveBlock::linear(vec![1.0; NUM_VARS]),
        constraints: ConstraintBlock::from_dense(rows, lower, upper).unwrap(),
        variables: VariableBlock::continuous(vec![-5.0; NUM_VARS], vec![5.0; NUM_VARS])
            .with_discrete(vec![0]),
    })
    .unwrap()
}

/// Everything an edit may touch, for before/after comparisons
#[derive(Debug, PartialEq)]
struct Snapshot {
    num_vars: usize,
    rows: Vec<SparseRow>,
    cns_lower: Vec<f64>,
    cns_upper: Vec<f64>,
    var_lower: Vec<f64>,
    var_upper: Vec<f64>,
    discrete: Vec<usize>,
}

fn snapshot(model: &ProblemModel) -> Snapshot {
    Snapshot {
        num_vars: model.num_vars(),
        rows: model.constraint_rows(),
        cns_lower: model.cns_lower().to_vec(),
        cns_upper: model.cns_upper().to_vec(),
        var_lower: model.var_lower().to_vec(),
        var_upper: model.var_upper().to_vec(),
        discrete: model.discrete().to_vec(),
    }
}

fn rows_and_permutation() -> impl Strategy<Value = (Vec<Vec<f64>>, Vec<usize>)> {
    rows_strategy().prop_flat_map(|rows| {
        let m = rows.len();
        (Just(rows), Just((0..m).collect::<Vec<usize>>()).prop_shuffle())
    })
}

fn rows_and_subset() -> impl Strategy<Value = (Vec<Vec<f64>>, Vec<usize>)> {
    rows_strategy().prop_flat_map(|rows| {
        let m = rows.len();
        let all: Vec<usize> = (0..m).collect();
        (Just(rows), prop::sample::subsequence(all, 0..=m))
    })
}

proptest! {
    // =====================================
    // Constraint reordering and removal
    // =====================================

    /// Permuting the constraints and then applying the inverse permutation
    /// restores rows and bounds
    #[test]
    fn permutation_then_inverse_restores((rows, perm) in rows_and_permutation()) {
        let mut model = build_model(&rows);
        let before = snapshot(&model);

        model.permute_constraints(&perm).unwrap();
        for (k, &p) in perm.iter().enumerate() {
            prop_assert_eq!(model.cns_lower()[k], before.cns_lower[p]);
        }

        let mut inverse = vec![0; perm.len()];
        for (k, &p) in perm.iter().enumerate() {
            inverse[p] = k;
        }
        model.permute_constraints(&inverse).unwrap();
        prop_assert_eq!(snapshot(&model), before);
    }

    /// Removing distinct indices drops exactly that many rows and keeps the
    /// others in order
    #[test]
    fn removal_reduces_count((rows, removed) in rows_and_subset()) {
        let mut model = build_model(&rows);
        let before = snapshot(&model);

        model.remove_constraints(&removed).unwrap();
        prop_assert_eq!(model.num_constraints(), rows.len() - removed.len());

        let kept: Vec<f64> = (0..rows.len())
            .filter(|k| !removed.contains(k))
            .map(|k| before.cns_upper[k])
            .collect();
        prop_assert_eq!(model.cns_upper().to_vec(), kept);
    }

    // =====================================
    // Failed edits leave the model untouched
    // =====================================

    #[test]
    fn failed_edits_are_atomic(rows in rows_strategy(), extra in 1usize..4) {
        let mut model = build_model(&rows);
        let before = snapshot(&model);
        let m = rows.len();

        let insert = model.insert_constraints_at(m + extra, ConstraintBlock::empty(NUM_VARS));
        prop_assert!(matches!(insert, Err(BnbError::Index(_))));

        let duplicate = model.remove_constraints(&[0, 0]);
        prop_assert!(matches!(duplicate, Err(BnbError::Validation(_))));

        let mut not_bijective: Vec<usize> = (0..m).collect();
        not_bijective[0] = m - 1;
        if m > 1 {
            let permute = model.permute_constraints(&not_bijective);
            prop_assert!(matches!(permute, Err(BnbError::Validation(_))));
        }

        let mismatched = ConstraintBlock::from_dense(
            &[vec![1.0; NUM_VARS]],
            vec![0.0; extra + 1],
            vec![1.0],
        )
        .unwrap();
        prop_assert!(matches!(model.append_constraints(mismatched), Err(BnbError::Shape(_))));

        let too_long = BoundsUpdate::default().var_lower(vec![0.0; NUM_VARS + extra]);
        let bounds = model.update_bounds(&too_long);
        prop_assert!(matches!(bounds, Err(BnbError::Shape(_))));

        let integralize = model.integralize_variables(&[NUM_VARS + extra], None);
        prop_assert!(matches!(integralize, Err(BnbError::Index(_))));

        prop_assert_eq!(snapshot(&model), before);
    }

    // =====================================
    // Discreteness
    // =====================================

    /// Integralizing twice is the same as integralizing once
    #[test]
    fn integralize_is_idempotent(
        rows in rows_strategy(),
        indices in prop::sample::subsequence(vec![0usize, 1, 2], 0..=3),
    ) {
        let mut model = build_model(&rows);
        model.integralize_variables(&indices, None).unwrap();
        let once = snapshot(&model);

        let impact = model.integralize_variables(&indices, None).unwrap();
        prop_assert_eq!(impact, miqp_bnb::EditImpact::Neutral);
        prop_assert_eq!(snapshot(&model), once);
    }

    // =====================================
    // Index boundary
    // =====================================

    /// Host indices survive a round trip through the internal base
    #[test]
    fn index_base_round_trip(
        len in 0usize..20,
        one_based in proptest::bool::ANY,
        seed in prop::collection::vec(0usize..20, 0..20),
    ) {
        let base = if one_based { IndexBase::One } else { IndexBase::Zero };
        let internal: Vec<usize> = seed.into_iter().filter(|&i| i < len).collect();

        let host = base.indices_to_host(&internal);
        prop_assert_eq!(base.indices_to_internal(&host, len).unwrap(), internal);

        // One past the end is always rejected
        let past_end = base.to_host(len);
        prop_assert!(base.indices_to_internal(&[past_end], len).is_err());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Tightening variable bounds never lowers the relaxation objective
    #[test]
    fn tightening_never_lowers_relaxation(
        targets in prop::collection::vec(-3.0f64..3.0, NUM_VARS),
        cuts in prop::collection::vec(0.0f64..1.0, NUM_VARS),
    ) {
        let mut q = vec![vec![0.0; NUM_VARS]; NUM_VARS];
        for (i, row) in q.iter_mut().enumerate() {
            row[i] = 2.0;
        }
        let linear: Vec<f64> = targets.iter().map(|t| -2.0 * t).collect();
        let model = ProblemModel::new(ProblemDefinition {
            objective: ObjectiveBlock::from_dense(&q, linear).unwrap(),
            constraints: ConstraintBlock::from_dense(
                &[vec![1.0; NUM_VARS]],
                vec![-6.0],
                vec![6.0],
            )
            .unwrap(),
            variables: VariableBlock::continuous(vec![-2.0; NUM_VARS], vec![2.0; NUM_VARS]),
        })
        .unwrap();

        let mut solver = ClarabelBackend::new(ClarabelSettings::default());
        let loose = solver
            .solve_relaxation(&model, model.var_lower(), model.var_upper(), None)
            .unwrap();
        prop_assert_eq!(loose.status, RelaxationStatus::Optimal);

        // Raise every lower bound somewhere into [-2, 2)
        let lower: Vec<f64> = cuts.iter().map(|c| -2.0 + 4.0 * c).collect();
        let tight = solver
            .solve_relaxation(&model, &lower, model.var_upper(), None)
            .unwrap();
        prop_assert_eq!(tight.status, RelaxationStatus::Optimal);
        prop_assert!(tight.objective >= loose.objective - 1e-5);
    }
}
