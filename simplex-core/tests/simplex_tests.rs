//! End-to-end tests of the revised simplex.
//!
//! Optimal answers are checked through the optimality conditions (primal
//! feasibility, reduced-cost signs, zero duality gap); infeasible answers
//! through the Farkas certificate.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use simplex_core::{LpProblem, ProblemStatus, RevisedSimplex, SimplexSettings, VariableStatus};

const TOL: f64 = 1e-6;

fn row_activity(lp: &LpProblem, x: &[f64]) -> Vec<f64> {
    let mut act = vec![0.0; lp.num_rows()];
    for (col, column) in lp.matrix().outer_iterator().enumerate() {
        for (row, &a) in column.iter() {
            act[row] += a * x[col];
        }
    }
    act
}

fn check_optimality(lp: &LpProblem, simplex: &RevisedSimplex) {
    let n = lp.num_cols();
    let x: Vec<f64> = (0..n).map(|j| simplex.variable_value(j)).collect();
    for j in 0..n {
        assert!(x[j] >= lp.col_lower[j] - TOL && x[j] <= lp.col_upper[j] + TOL);
    }
    let act = row_activity(lp, &x);
    for (r, &a) in act.iter().enumerate() {
        assert!(a >= lp.row_lower[r] - TOL && a <= lp.row_upper[r] + TOL);
        assert!((a - simplex.constraint_activity(r)).abs() < TOL);
    }
    for j in 0..n {
        let d = simplex.reduced_cost(j);
        match simplex.variable_status(j) {
            VariableStatus::Basic => assert!(d.abs() < TOL),
            VariableStatus::AtLowerBound => assert!(d >= -TOL),
            VariableStatus::AtUpperBound => assert!(d <= TOL),
            VariableStatus::Free => assert!(d.abs() < TOL),
            VariableStatus::FixedValue => {}
        }
    }

    // Dual objective: sum_r y_r * bound_r + sum_j d_j * bound_j must match.
    let mut dual_obj = lp.objective_offset;
    for r in 0..lp.num_rows() {
        let y = simplex.dual_value(r);
        if y.abs() > TOL {
            let bound = if y < 0.0 { lp.row_upper[r] } else { lp.row_lower[r] };
            dual_obj += y * bound;
        }
    }
    for j in 0..n {
        let d = simplex.reduced_cost(j);
        if d.abs() > TOL {
            let bound = if d > 0.0 { lp.col_lower[j] } else { lp.col_upper[j] };
            dual_obj += d * bound;
        }
    }
    assert!(
        (dual_obj - simplex.objective_value()).abs() < 1e-5,
        "duality gap: primal {} dual {}",
        simplex.objective_value(),
        dual_obj
    );
}

fn check_farkas(lp: &LpProblem, ray: &[f64]) {
    let mut combined = vec![0.0; lp.num_cols()];
    let mut rhs = 0.0;
    for (col, column) in lp.matrix().outer_iterator().enumerate() {
        for (row, &a) in column.iter() {
            combined[col] += ray[row] * a;
        }
    }
    for (r, &w) in ray.iter().enumerate() {
        if w > 0.0 {
            rhs += w * lp.row_upper[r];
        } else if w < 0.0 {
            rhs += w * lp.row_lower[r];
        }
    }
    let min_activity: f64 = combined
        .iter()
        .enumerate()
        .map(|(j, &c)| if c > 0.0 { c * lp.col_lower[j] } else { c * lp.col_upper[j] })
        .sum();
    assert!(min_activity > rhs + 1e-9, "ray does not prove infeasibility: {min_activity} <= {rhs}");
}

#[test]
fn test_equality_and_ranges() {
    // min x + 2y - z
    // s.t. x + y + z = 4
    //      1 <= x - y <= 2
    //      0 <= x, y, z <= 3
    let mut lp = LpProblem::new(3);
    lp.set_rows(
        vec![4.0, 1.0],
        vec![4.0, 2.0],
        vec![(0, 0, 1.0), (0, 1, 1.0), (0, 2, 1.0), (1, 0, 1.0), (1, 1, -1.0)],
    );
    for j in 0..3 {
        lp.set_variable_bounds(j, 0.0, 3.0);
    }
    lp.objective = vec![1.0, 2.0, -1.0];

    let mut simplex = RevisedSimplex::default();
    assert_eq!(simplex.solve(&lp).unwrap(), ProblemStatus::Optimal);
    check_optimality(&lp, &simplex);
    // z = 3, x = 1, y = 0 gives -2
    assert!((simplex.objective_value() + 2.0).abs() < 1e-9);
}

#[test]
fn test_infeasible_with_ray() {
    // x + y >= 5 with x, y in [0, 2]
    let mut lp = LpProblem::new(2);
    lp.set_rows(vec![5.0], vec![f64::INFINITY], vec![(0, 0, 1.0), (0, 1, 1.0)]);
    lp.set_variable_bounds(0, 0.0, 2.0);
    lp.set_variable_bounds(1, 0.0, 2.0);

    let mut simplex = RevisedSimplex::default();
    assert_eq!(simplex.solve(&lp).unwrap(), ProblemStatus::PrimalInfeasible);
    check_farkas(&lp, simplex.dual_ray());
}

#[test]
fn test_unbounded() {
    let mut lp = LpProblem::new(2);
    lp.set_rows(vec![f64::NEG_INFINITY], vec![1.0], vec![(0, 0, 1.0), (0, 1, -1.0)]);
    lp.set_variable_bounds(0, 0.0, f64::INFINITY);
    lp.set_variable_bounds(1, 0.0, f64::INFINITY);
    lp.objective = vec![-1.0, 0.0];

    let mut simplex = RevisedSimplex::default();
    assert_eq!(simplex.solve(&lp).unwrap(), ProblemStatus::PrimalUnbounded);
}

#[test]
fn test_iteration_limit_keeps_basis() {
    let mut lp = LpProblem::new(4);
    lp.set_rows(
        vec![f64::NEG_INFINITY; 2],
        vec![10.0, 12.0],
        vec![
            (0, 0, 3.0), (0, 1, 2.0), (0, 2, 1.0),
            (1, 1, 1.0), (1, 2, 4.0), (1, 3, 3.0),
        ],
    );
    for j in 0..4 {
        lp.set_variable_bounds(j, 0.0, 5.0);
        lp.objective[j] = -((j + 1) as f64);
    }

    let mut limited = RevisedSimplex::new(SimplexSettings {
        max_iterations: 1,
        ..Default::default()
    });
    assert_eq!(limited.solve(&lp).unwrap(), ProblemStatus::IterationLimit);
    let state = limited.state();

    let mut simplex = RevisedSimplex::default();
    simplex.load_state(state);
    assert_eq!(simplex.solve(&lp).unwrap(), ProblemStatus::Optimal);
    check_optimality(&lp, &simplex);
}

#[test]
fn test_unit_row_left_inverse() {
    let mut lp = LpProblem::new(2);
    lp.set_rows(
        vec![f64::NEG_INFINITY; 2],
        vec![4.0, 6.0],
        vec![(0, 0, 1.0), (0, 1, 1.0), (1, 0, 1.0), (1, 1, 3.0)],
    );
    lp.set_variable_bounds(0, 0.0, 10.0);
    lp.set_variable_bounds(1, 0.0, 10.0);
    lp.objective = vec![-1.0, -2.0];

    let mut simplex = RevisedSimplex::default();
    assert_eq!(simplex.solve(&lp).unwrap(), ProblemStatus::Optimal);
    // Both rows tight at x = 3, y = 1: the basis holds both columns, and
    // the row of B^-1 for the position of x, applied to the slack-free
    // system, reproduces x's value from the row activities.
    for pos in 0..2 {
        let var = simplex.basis(pos);
        assert!(var < 2);
        let lambda = simplex.unit_row_left_inverse(pos);
        let value: f64 = lambda
            .iter()
            .enumerate()
            .map(|(r, &l)| l * simplex.constraint_activity(r))
            .sum();
        assert!((value - simplex.variable_value(var)).abs() < 1e-9);
    }
}

#[test]
fn test_random_bounded_lps() {
    let mut rng = ChaCha8Rng::seed_from_u64(2024);
    let mut optimal = 0;
    let mut infeasible = 0;

    for _ in 0..60 {
        let n = rng.gen_range(2..7);
        let m = rng.gen_range(1..6);
        let mut lp = LpProblem::new(n);
        let mut triplets = Vec::new();
        let mut lower = Vec::new();
        let mut upper = Vec::new();
        for r in 0..m {
            for c in 0..n {
                if rng.gen_bool(0.6) {
                    triplets.push((r, c, rng.gen_range(-5..=5) as f64));
                }
            }
            let center = rng.gen_range(-8.0..8.0);
            match rng.gen_range(0..3) {
                0 => {
                    lower.push(f64::NEG_INFINITY);
                    upper.push(center);
                }
                1 => {
                    lower.push(center);
                    upper.push(f64::INFINITY);
                }
                _ => {
                    lower.push(center - 1.0);
                    upper.push(center + 1.0);
                }
            }
        }
        lp.set_rows(lower, upper, triplets);
        for j in 0..n {
            let lo = rng.gen_range(-3..=0) as f64;
            let hi = lo + rng.gen_range(0..=4) as f64;
            lp.set_variable_bounds(j, lo, hi);
            lp.objective[j] = rng.gen_range(-3.0..3.0);
        }

        let mut simplex = RevisedSimplex::default();
        match simplex.solve(&lp).unwrap() {
            ProblemStatus::Optimal => {
                optimal += 1;
                check_optimality(&lp, &simplex);
            }
            ProblemStatus::PrimalInfeasible => {
                infeasible += 1;
                check_farkas(&lp, simplex.dual_ray());
            }
            status => panic!("unexpected status {status:?}"),
        }
    }
    assert!(optimal > 0);
    assert!(infeasible > 0);
}
