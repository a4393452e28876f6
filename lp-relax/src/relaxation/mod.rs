//! The LP relaxation as a propagator of the integer search.
//!
//! [`LinearProgrammingConstraint`] keeps a pool of rows over a fixed set of
//! integer columns, loads a subset of them into a scaled LP and solves it
//! through a [`MasterBackend`]. The LP result becomes bound deductions with
//! exact explanations, new cuts, and branching hints.
//!
//! The search drives it with:
//! - [`propagate`](LinearProgrammingConstraint::propagate) after bound changes
//! - [`incremental_propagate`](LinearProgrammingConstraint::incremental_propagate)
//!   when only watched columns changed
//! - [`set_level`](LinearProgrammingConstraint::set_level) whenever the
//!   decision level changes, so per-level state can be restored

mod branch;
mod integer_lp;
mod propagate;
mod reasoning;
mod solve;
mod stats;

pub use branch::{BranchingReport, BranchOutcome};
pub use integer_lp::{IntegerLp, IntegerRow};
pub use stats::LpStatistics;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use simplex_core::{BasisState, LpProblem};

use crate::certificate::IntegerSumLe;
use crate::cuts::{
    builtin_separators, expanded_value, ConstraintPool, CutBuilder, CutGenerator, CutSeparator, ImpliedBoundEntry,
};
use crate::error::{RelaxError, RelaxResult};
use crate::master::{LpScaler, MasterBackend, MasterStatus};
use crate::math::ScatteredIntegerVector;
use crate::model::{IntegerTrail, IntegerValue, IntegerVariable, LinearConstraint, WatchRegistry};
use crate::search::{LevelSnapshots, ReducedCostAverages};
use crate::settings::LpSettings;
use crate::time_limit::TimeLimit;

/// Tolerance used when rounding LP values to integers.
pub const CP_EPSILON: f64 = 1e-4;

/// Tolerance on reduced costs.
pub const LP_EPSILON: f64 = 1e-6;

/// LP multipliers below this magnitude are treated as zero.
pub const ZERO_TOLERANCE: f64 = 1e-12;

/// Budget of the first solve below the root, before any adaptation.
const INITIAL_SIMPLEX_ITERATIONS: u64 = 500;

/// Last optimal LP point, in the integer space.
#[derive(Debug, Clone, Default)]
struct SolutionCache {
    is_set: bool,
    level: usize,
    values: Vec<f64>,
    expanded: Vec<f64>,
    reduced_costs: Vec<f64>,
    level_zero_values: Vec<f64>,
    level_zero_objective: f64,
    is_integer: bool,
    objective: f64,
}

impl SolutionCache {
    fn new(variables: &[IntegerVariable]) -> Self {
        let num_cols = variables.len();
        let expanded_len = variables.iter().map(|v| v.index() + 2).max().unwrap_or(0);
        Self {
            values: vec![0.0; num_cols],
            expanded: vec![0.0; expanded_len],
            reduced_costs: vec![0.0; num_cols],
            ..Self::default()
        }
    }

    fn set_values(&mut self, variables: &[IntegerVariable], values: Vec<f64>) {
        for (&var, &value) in variables.iter().zip(&values) {
            self.expanded[var.index()] = value;
            self.expanded[var.negation().index()] = -value;
        }
        self.values = values;
    }
}

/// What is restored when the search comes back to a level.
#[derive(Debug, Clone)]
struct LevelState {
    lp_constraints: Vec<usize>,
    basis: BasisState,
    num_optimal_constraints: usize,
}

#[derive(Debug, Clone, Default)]
struct Counters {
    num_solves: u64,
    num_solves_by_status: [u64; stats::NUM_STATUSES],
    total_simplex_iterations: u64,
    num_cut_propagations: u64,
    num_cut_rounds: u64,
    num_strong_branches: u64,
    degeneracy_sum: f64,
}

/// LP relaxation of a set of linear constraints over integer columns.
///
/// Columns are positive integer variables given at construction. Rows are
/// added with [`add_linear_constraint`](Self::add_linear_constraint) and
/// managed by a [`ConstraintPool`] that also stores the cuts. The relaxation
/// minimizes the integer objective set with
/// [`set_objective_coefficient`](Self::set_objective_coefficient); the
/// objective variable registered with
/// [`set_main_objective_variable`](Self::set_main_objective_variable) must
/// satisfy `objective_var >= sum c x` in the model.
///
/// # Example
///
/// ```
/// use lp_relax::{
///     BoundsTrail, IntegerTrail, LinearConstraint, LinearProgrammingConstraint, LpSettings, SimplexBackend, TimeLimit,
/// };
///
/// let mut trail = BoundsTrail::new();
/// let x = trail.new_variable(0, 2);
/// let y = trail.new_variable(0, 2);
/// let objective = trail.new_variable(-10, 10);
///
/// let mut lp = LinearProgrammingConstraint::new(
///     LpSettings::default(),
///     vec![x, y],
///     Box::new(SimplexBackend::default()),
///     TimeLimit::unlimited(),
/// )
/// .unwrap();
/// lp.add_linear_constraint(LinearConstraint::less_or_equal(&[(x, 1), (y, 1)], 3)).unwrap();
/// lp.set_objective_coefficient(x, -1).unwrap();
/// lp.set_objective_coefficient(y, -1).unwrap();
/// lp.set_main_objective_variable(objective);
/// lp.register_with(&mut trail).unwrap();
///
/// assert!(lp.propagate(&mut trail));
/// assert_eq!(trail.lower_bound(objective), -3);
/// ```
pub struct LinearProgrammingConstraint {
    settings: LpSettings,
    time_limit: TimeLimit,
    rng: ChaCha8Rng,
    backend: Box<dyn MasterBackend>,

    integer_lp: IntegerLp,
    objective_coeffs: Vec<IntegerValue>,
    objective_var: Option<IntegerVariable>,
    pool: ConstraintPool,
    builder: CutBuilder,
    separators: Vec<Box<dyn CutSeparator>>,
    generators: Vec<Box<dyn CutGenerator>>,
    acc: ScatteredIntegerVector,

    problem: LpProblem,
    scaler: LpScaler,
    // Pool index of each LP row.
    lp_rows: Vec<usize>,
    needs_rebuild: bool,
    pending_basis: Option<BasisState>,
    last_status: Option<MasterStatus>,
    lp_at_level_zero_is_final: bool,
    next_simplex_iter: u64,
    is_degenerate: bool,
    num_degenerate_columns: usize,

    solution: SolutionCache,
    optimal_constraints: Vec<IntegerSumLe>,

    current_level: usize,
    snapshots: LevelSnapshots<LevelState>,

    rc_averages: ReducedCostAverages,
    count_since_last_branching: u64,
    branching_frequency: u64,
    last_branching: Option<BranchingReport>,

    counters: Counters,
}

impl LinearProgrammingConstraint {
    /// Create a relaxation over `variables`, which must be positive and
    /// strictly increasing.
    pub fn new(
        settings: LpSettings,
        variables: Vec<IntegerVariable>,
        backend: Box<dyn MasterBackend>,
        time_limit: TimeLimit,
    ) -> RelaxResult<Self> {
        settings.validate()?;
        if let Some(var) = variables.iter().find(|v| !v.is_positive()) {
            return Err(RelaxError::InvalidModel(format!("column {var:?} is a negated view")));
        }
        if variables.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(RelaxError::InvalidModel("columns must be strictly increasing".into()));
        }

        let num_cols = variables.len();
        let next_simplex_iter =
            INITIAL_SIMPLEX_ITERATIONS.clamp(settings.min_simplex_iterations, settings.max_simplex_iterations);
        Ok(Self {
            rng: ChaCha8Rng::seed_from_u64(settings.random_seed),
            backend,
            objective_coeffs: vec![0; num_cols],
            objective_var: None,
            pool: ConstraintPool::new(settings.pool.clone()),
            builder: CutBuilder::new(settings.max_integer_rounding_scaling),
            separators: builtin_separators(&settings),
            generators: Vec::new(),
            acc: ScatteredIntegerVector::new(),
            problem: LpProblem::new(num_cols),
            scaler: LpScaler::identity(0, num_cols),
            lp_rows: Vec::new(),
            needs_rebuild: true,
            pending_basis: None,
            last_status: None,
            lp_at_level_zero_is_final: false,
            next_simplex_iter,
            is_degenerate: false,
            num_degenerate_columns: 0,
            solution: SolutionCache::new(&variables),
            optimal_constraints: Vec::new(),
            current_level: 0,
            snapshots: LevelSnapshots::new(),
            rc_averages: ReducedCostAverages::new(num_cols),
            count_since_last_branching: 0,
            branching_frequency: 1,
            last_branching: None,
            counters: Counters::default(),
            integer_lp: IntegerLp::new(variables),
            time_limit,
            settings,
        })
    }

    // ========================================================================
    // Setup
    // ========================================================================

    /// Add a problem constraint over the columns. Returns true if it is new,
    /// false if it was merged into a row with the same terms.
    pub fn add_linear_constraint(&mut self, ct: LinearConstraint) -> RelaxResult<bool> {
        if let Some(var) = ct.vars.iter().find(|&&v| self.integer_lp.column_of(v).is_none()) {
            return Err(RelaxError::InvalidModel(format!("{var:?} is not a column of the relaxation")));
        }
        let (index, is_new) = self.pool.add(ct)?;
        if !is_new && self.pool.lp_constraints().contains(&index) {
            self.needs_rebuild = true;
        }
        Ok(is_new)
    }

    /// Add `coeff * var` to the minimized objective.
    pub fn set_objective_coefficient(&mut self, var: IntegerVariable, coeff: IntegerValue) -> RelaxResult<()> {
        let Some(col) = self.integer_lp.column_of(var) else {
            return Err(RelaxError::InvalidModel(format!("{var:?} is not a column of the relaxation")));
        };
        let signed = if var.is_positive() { coeff } else { -coeff };
        self.objective_coeffs[col] = self.objective_coeffs[col]
            .checked_add(signed)
            .ok_or(RelaxError::Overflow("the objective"))?;
        self.pool.set_objective_coefficient(var, coeff);
        self.needs_rebuild = true;
        Ok(())
    }

    /// Variable bounded below by the LP objective.
    pub fn set_main_objective_variable(&mut self, var: IntegerVariable) {
        self.objective_var = Some(var);
    }

    /// Add a caller-supplied cut generator, run after the built-in ones.
    pub fn add_cut_generator(&mut self, generator: Box<dyn CutGenerator>) {
        self.generators.push(generator);
    }

    /// Record `entry.literal => var >= entry.bound` for the cut pipeline.
    pub fn add_implied_bound(&mut self, var: IntegerVariable, entry: ImpliedBoundEntry) {
        self.builder.implied_bounds_mut().add(var, entry);
    }

    /// Build the LP and attach to the search: one watch per column, indexed
    /// by column, and a call on every level-zero propagation.
    ///
    /// Fails with [`RelaxError::Infeasible`] if a loaded row has an empty
    /// domain.
    pub fn register_with<T: IntegerTrail + WatchRegistry>(&mut self, trail: &mut T) -> RelaxResult<()> {
        if !self.settings.add_lp_constraints_lazily {
            self.pool.add_all_constraints_to_lp();
        }
        if !self.create_lp_from_constraint_manager(&*trail) {
            return Err(RelaxError::Infeasible("a loaded row has an empty domain".into()));
        }
        for (col, &var) in self.integer_lp.variables.iter().enumerate() {
            trail.watch_variable(var, col);
        }
        trail.always_call_at_level_zero();
        self.current_level = trail.current_decision_level();
        log::debug!(
            "registered LP relaxation: {} columns, {} pool rows, {} loaded",
            self.integer_lp.num_cols(),
            self.pool.len(),
            self.integer_lp.num_rows()
        );
        Ok(())
    }

    // ========================================================================
    // Levels
    // ========================================================================

    /// Follow the search to decision `level`.
    ///
    /// Going deeper saves the loaded rows, the basis and the retained exact
    /// constraints of every level that is left; going back restores what was
    /// saved at `level`. The cached LP point is dropped when it was computed
    /// deeper than `level`, except at level zero where the last level-zero
    /// point is restored.
    pub fn set_level(&mut self, level: usize) {
        if level > self.current_level {
            let state = LevelState {
                lp_constraints: self.pool.lp_constraints().to_vec(),
                basis: self.backend.state(),
                num_optimal_constraints: self.optimal_constraints.len(),
            };
            self.snapshots.descend(self.current_level, level, &state);
        } else if level < self.current_level {
            if let Some(saved) = self.snapshots.backtrack(level) {
                self.restore_level_state(saved);
            }
        }
        self.current_level = level;

        if self.solution.is_set && level < self.solution.level {
            self.solution.is_set = false;
        }
        if level == 0 && !self.solution.level_zero_values.is_empty() {
            let values = self.solution.level_zero_values.clone();
            self.solution.is_integer = values.iter().all(|v| (v - v.round()).abs() <= CP_EPSILON);
            self.solution.objective = self.solution.level_zero_objective;
            self.solution.set_values(&self.integer_lp.variables, values);
            self.solution.is_set = true;
            self.solution.level = 0;
        }
    }

    fn restore_level_state(&mut self, saved: LevelState) {
        self.optimal_constraints.truncate(saved.num_optimal_constraints);
        if self.pool.lp_constraints() != saved.lp_constraints.as_slice() {
            self.pool.set_lp_constraints(saved.lp_constraints);
            self.needs_rebuild = true;
            self.pending_basis = Some(saved.basis);
        } else {
            self.backend.load_state(saved.basis);
        }
    }

    // ========================================================================
    // Solution access
    // ========================================================================

    /// True when an LP point valid at the current level is cached.
    pub fn has_solution(&self) -> bool {
        self.solution.is_set
    }

    /// Cached LP value of `var` (either view); zero for non-columns.
    pub fn solution_value(&self, var: IntegerVariable) -> f64 {
        expanded_value(&self.solution.expanded, var)
    }

    /// Cached LP values indexed by [`IntegerVariable::index`].
    pub fn expanded_solution(&self) -> &[f64] {
        &self.solution.expanded
    }

    /// Reduced cost of `var` (either view) at the last optimal solve.
    pub fn reduced_cost(&self, var: IntegerVariable) -> f64 {
        match self.integer_lp.column_of(var) {
            Some(col) if var.is_positive() => self.solution.reduced_costs[col],
            Some(col) => -self.solution.reduced_costs[col],
            None => 0.0,
        }
    }

    /// Objective value of the last optimal solve, offset included.
    pub fn lp_objective(&self) -> f64 {
        self.solution.objective
    }

    /// True when every column of the cached point is integral within
    /// [`CP_EPSILON`].
    pub fn solution_is_integer(&self) -> bool {
        self.solution.is_set && self.solution.is_integer
    }

    /// True once a level-zero propagation found nothing left to load.
    pub fn level_zero_is_final(&self) -> bool {
        self.lp_at_level_zero_is_final
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Columns, in LP order.
    pub fn variables(&self) -> &[IntegerVariable] {
        &self.integer_lp.variables
    }

    /// Integer rows currently loaded.
    pub fn integer_lp(&self) -> &IntegerLp {
        &self.integer_lp
    }

    /// Managed constraints and cuts.
    pub fn pool(&self) -> &ConstraintPool {
        &self.pool
    }

    /// Exact constraints retained for the current subtree.
    pub fn optimal_constraints(&self) -> &[IntegerSumLe] {
        &self.optimal_constraints
    }

    /// Status of the last main solve.
    pub fn last_status(&self) -> Option<MasterStatus> {
        self.last_status
    }

    /// Decayed reduced-cost averages.
    pub fn rc_averages(&self) -> &ReducedCostAverages {
        &self.rc_averages
    }

    /// Report of the last strong-branching call.
    pub fn last_branching_report(&self) -> Option<&BranchingReport> {
        self.last_branching.as_ref()
    }

    /// Iteration budget of the next solve below the root.
    pub fn next_simplex_iterations(&self) -> u64 {
        self.next_simplex_iter
    }

    /// True when the last solve left many non-basic columns with a zero
    /// reduced cost.
    pub fn is_degenerate(&self) -> bool {
        self.is_degenerate
    }

    /// Mean number of degenerate columns per optimal solve.
    pub fn average_degeneracy(&self) -> f64 {
        let num_optimal = self.counters.num_solves_by_status[stats::status_index(MasterStatus::Optimal)];
        if num_optimal == 0 {
            0.0
        } else {
            self.counters.degeneracy_sum / num_optimal as f64
        }
    }

    /// Non-basic columns with a zero reduced cost after the last solve.
    pub fn num_degenerate_columns(&self) -> usize {
        self.num_degenerate_columns
    }

    /// Decision level the relaxation last synchronized with.
    pub fn current_level(&self) -> usize {
        self.current_level
    }

    /// Settings in use.
    pub fn settings(&self) -> &LpSettings {
        &self.settings
    }

    /// Snapshot of the counters.
    pub fn statistics(&self) -> LpStatistics {
        let counters = &self.counters;
        LpStatistics {
            num_cols: self.integer_lp.num_cols(),
            num_rows: self.integer_lp.num_rows(),
            num_entries: self.integer_lp.rows.iter().map(|r| r.terms.len()).sum(),
            num_pool_constraints: self.pool.len(),
            num_pool_cuts: self.pool.num_cuts(),
            total_simplex_iterations: counters.total_simplex_iterations,
            num_solves: counters.num_solves,
            solves_by_status: stats::STATUSES
                .iter()
                .zip(counters.num_solves_by_status)
                .map(|(&status, count)| (status, count))
                .collect(),
            num_cut_propagations: counters.num_cut_propagations,
            num_cut_rounds: counters.num_cut_rounds,
            num_strong_branches: counters.num_strong_branches,
            cuts_by_name: self.pool.stats().cuts_by_name.clone(),
            builder: self.builder.stats().clone(),
            average_degeneracy: self.average_degeneracy(),
        }
    }
}
