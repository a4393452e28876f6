//! The propagation loop: solve, exploit, cut, reload, repeat.

use super::{LinearProgrammingConstraint, CP_EPSILON};
use crate::cuts::{ObjectiveInfo, SeparationContext, SolutionView};
use crate::master::MasterStatus;
use crate::model::{IntegerTrail, IntegerVariable};

/// Cap on the reloads of violated pool rows in one propagation.
const MAX_LOADING_ROUNDS: usize = 100;

/// Fractional columns tried per branching attempt.
const NUM_BRANCHING_CANDIDATES: usize = 3;

/// How a reload of the LP went.
enum Reload {
    /// The pool kept the loaded set as is.
    Unchanged,
    /// Rows were added and the LP solved and exploited again.
    Resolved,
    /// Nothing more to do this round.
    Stop,
    /// Conflict reported on the trail.
    Conflict,
}

impl LinearProgrammingConstraint {
    fn sync_level(&mut self, trail: &dyn IntegerTrail) {
        let level = trail.current_decision_level();
        if level != self.current_level {
            self.set_level(level);
        }
    }

    /// Solve the LP under the current bounds and push what it implies.
    ///
    /// At level zero, violated pool rows are loaded and cut rounds run until
    /// the LP stops changing or the round budget is spent. Returns false on
    /// conflict; the explanation is on the trail.
    pub fn propagate(&mut self, trail: &mut dyn IntegerTrail) -> bool {
        self.sync_level(&*trail);
        if self.needs_rebuild {
            if !self.create_lp_from_constraint_manager(&*trail) {
                return trail.report_conflict(&[]);
            }
            if let Some(basis) = self.pending_basis.take() {
                self.backend.load_state(basis);
            }
        }
        if self.time_limit.limit_reached() {
            return true;
        }

        self.update_bounds_of_lp_variables(&*trail);
        if !self.solve_lp() {
            return true;
        }
        if !self.analyze_lp(trail) {
            return false;
        }

        for _ in 0..MAX_LOADING_ROUNDS {
            if !self.lp_is_optimal() {
                break;
            }
            match self.reload_and_resolve(trail) {
                Reload::Resolved => {}
                Reload::Conflict => return false,
                Reload::Unchanged | Reload::Stop => break,
            }
        }

        let level = self.current_level;
        let max_rounds = if level == 0 {
            self.settings.max_cut_rounds_at_level_zero
        } else {
            1
        };
        let mut rounds = 0;
        while rounds < max_rounds && self.lp_is_optimal() && !self.time_limit.limit_reached() {
            rounds += 1;
            if level == 0 {
                self.run_separators(trail);
                if self.builder.take_infeasible() {
                    return false;
                }
            }
            if (level == 0 || !self.settings.only_add_cuts_at_level_zero) && !self.run_cut_generators(level) {
                return trail.report_conflict(&[]);
            }
            match self.reload_and_resolve(trail) {
                Reload::Resolved => {}
                Reload::Conflict => return false,
                Reload::Unchanged | Reload::Stop => break,
            }
        }
        self.counters.num_cut_rounds += rounds as u64;
        if self.settings.verbose && level == 0 {
            log::info!(
                "root LP: objective {:.6}, {} cut rounds, {} cuts in pool ({})",
                self.solution.objective,
                rounds,
                self.pool.num_cuts(),
                self.dimension_string()
            );
        }

        if self.should_branch() {
            return self.branch_on_candidates(trail);
        }
        true
    }

    /// Re-propagate the retained exact constraints when the LP point is
    /// still within the new bounds of the watched columns, or run a full
    /// [`propagate`](Self::propagate) otherwise.
    pub fn incremental_propagate(&mut self, trail: &mut dyn IntegerTrail, watch_indices: &[usize]) -> bool {
        self.sync_level(&*trail);
        let point_moved = watch_indices.iter().any(|&col| {
            let Some(&var) = self.integer_lp.variables.get(col) else {
                return false;
            };
            let value = self.solution.values[col];
            value < trail.lower_bound(var) as f64 - CP_EPSILON || value > trail.upper_bound(var) as f64 + CP_EPSILON
        });
        if !self.solution.is_set
            || (self.current_level == 0 && !self.lp_at_level_zero_is_final)
            || self.needs_rebuild
            || point_moved
        {
            return self.propagate(trail);
        }
        for ct in &self.optimal_constraints {
            if !ct.propagate(trail) {
                return false;
            }
        }
        true
    }

    fn lp_is_optimal(&self) -> bool {
        self.last_status == Some(MasterStatus::Optimal)
    }

    /// Let the pool update the loaded rows for the current point and, when
    /// rows were added, solve and exploit the new LP from the old basis.
    fn reload_and_resolve(&mut self, trail: &mut dyn IntegerTrail) -> Reload {
        let state = self.backend.state();
        let old_rows = self.lp_rows.clone();
        let (changed, added) = self.pool.change_lp(&self.solution.expanded);
        if !changed {
            if self.current_level == 0 {
                self.lp_at_level_zero_is_final = true;
            }
            return Reload::Unchanged;
        }
        if !self.create_lp_from_constraint_manager(&*trail) {
            trail.report_conflict(&[]);
            return Reload::Conflict;
        }
        let basis = self.remap_basis(&state, &old_rows);
        self.backend.load_state(basis);
        if added == 0 {
            return Reload::Stop;
        }

        let previous = self.solution.objective;
        if !self.solve_lp() {
            return Reload::Stop;
        }
        if !self.analyze_lp(trail) {
            return Reload::Conflict;
        }
        log::debug!(
            "reloaded {added} rows: objective {previous:.6} -> {:.6}",
            self.solution.objective
        );
        Reload::Resolved
    }

    /// Run the built-in separators on the current point. Returns the number
    /// of cuts admitted to the pool.
    fn run_separators(&mut self, trail: &mut dyn IntegerTrail) -> usize {
        let row_activities: Vec<f64> = (0..self.integer_lp.num_rows())
            .map(|row| self.scaler.unscale_activity(row, self.backend.constraint_activity(row)))
            .collect();
        let objective = self.objective_var.map(|var| ObjectiveInfo {
            var,
            lp_value: self.solution.objective,
        });
        let mut ctx = SeparationContext {
            view: SolutionView {
                lp: &self.integer_lp,
                lp_values: &self.solution.expanded,
                row_activities: &row_activities,
            },
            backend: self.backend.as_ref(),
            scaler: &self.scaler,
            objective,
            max_mir_aggregations: self.settings.max_mir_aggregations,
            builder: &mut self.builder,
            pool: &mut self.pool,
            trail,
            rng: &mut self.rng,
            time_limit: &self.time_limit,
        };

        let mut total = 0;
        for separator in &mut self.separators {
            if ctx.time_limit.limit_reached() {
                break;
            }
            let added = separator.separate(&mut ctx);
            if added > 0 {
                log::debug!("{}: {} cuts", separator.name(), added);
            }
            total += added;
        }
        total
    }

    /// Run the caller-supplied generators. Returns false if one of them
    /// proved infeasibility.
    fn run_cut_generators(&mut self, level: usize) -> bool {
        for generator in &mut self.generators {
            if level > 0 && generator.only_at_level_zero() {
                continue;
            }
            if !generator.generate_cuts(&self.solution.expanded, &mut self.pool) {
                log::debug!("cut generator {} proved infeasibility", generator.name());
                return false;
            }
        }
        true
    }

    fn should_branch(&self) -> bool {
        self.settings.use_branching_in_lp
            && self.settings.linearization_level >= 2
            && self.objective_var.is_some()
            && self.current_level == 0
            && self.lp_is_optimal()
            && self.solution.is_set
            && !self.solution.is_integer
            && !self.is_degenerate
    }

    /// Fractional columns, best reduced-cost score first.
    fn branching_candidates(&self) -> Vec<IntegerVariable> {
        let mut candidates: Vec<(f64, IntegerVariable)> = self
            .integer_lp
            .variables
            .iter()
            .enumerate()
            .filter(|&(col, _)| {
                let value = self.solution.values[col];
                (value - value.round()).abs() > CP_EPSILON
            })
            .map(|(col, &var)| (self.rc_averages.score(col), var))
            .collect();
        candidates.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));
        candidates
            .into_iter()
            .take(NUM_BRANCHING_CANDIDATES)
            .map(|(_, var)| var)
            .collect()
    }

    /// Strong branching on a few candidates, every `branching_frequency`
    /// calls. The interval doubles each time nothing is found.
    fn branch_on_candidates(&mut self, trail: &mut dyn IntegerTrail) -> bool {
        self.count_since_last_branching += 1;
        if self.count_since_last_branching < self.branching_frequency {
            return true;
        }
        self.count_since_last_branching = 0;

        let mut successful = false;
        for var in self.branching_candidates() {
            let report = self.branch_on_var(var, trail);
            if report.conflict {
                return false;
            }
            if !report.successful() {
                break;
            }
            successful = true;
        }
        if !successful {
            self.branching_frequency = self.branching_frequency.saturating_mul(2);
        }
        true
    }
}
