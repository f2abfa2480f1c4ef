//! The solver: owner of the propagation state, the constraint arena and
//! the model cache, and home of the `make_*` factories.

use crate::backtrack::Backtrack;
use crate::collections::RefVec;
use crate::constraints::basic::{EqualityCst, GreaterOrEqualCst, LessOrEqualCst, VarEquality};
use crate::constraints::bool_array::{
    ArrayBoolAndEq, ArrayBoolOrEq, SumBooleanEqualToOne, SumBooleanEqualToVar, SumBooleanGreaterOrEqualToOne,
    SumBooleanLessOrEqualToOne,
};
use crate::constraints::cumulative::Cumulative;
use crate::constraints::diffn::Diffn;
use crate::constraints::min_max::{MaxConstraint, MinConstraint};
use crate::constraints::scal_prod::{
    sort_coefficients, BooleanScalProdLessConstant, PositiveBooleanScalProdEqCst, PositiveBooleanScalProdEqVar,
};
use crate::constraints::sum::{detect_sum_overflow, SafeSumConstraint, SumConstraint};
use crate::constraints::{Constraint, PostCtx};
use crate::core::state::{Entity, QueueItem, State};
use crate::core::{cap_add, ConstraintId, DemonId, Failure, IntCst, IntervalId, SequenceId, SolverResult, VarRef};
use crate::core::{INT_CST_MAX, INT_CST_MIN};
use crate::model_cache::{CtOp, ExprOp, ModelCache};
use crate::params::SolverParameters;
use crate::sched::interval::SyncAnchor;
use std::cell::RefCell;
use std::collections::HashMap;

#[derive(Default, Debug, Clone)]
pub struct Stats {
    pub failures: u64,
    pub demon_runs: u64,
    pub constraints: u64,
}

pub struct Solver {
    params: SolverParameters,
    pub state: State,
    constraints: RefVec<ConstraintId, RefCell<Box<dyn Constraint>>>,
    cache: ModelCache,
    constants: HashMap<IntCst, VarRef>,
    stats: Stats,
}

impl Solver {
    pub fn new() -> Solver {
        Self::with_parameters(SolverParameters::default())
    }

    pub fn with_parameters(params: SolverParameters) -> Solver {
        let state = State::with_trail_capacity(params.trail_chunk_size);
        let cache = ModelCache::new(params.cache_initial_size);
        Solver {
            params,
            state,
            constraints: Default::default(),
            cache,
            constants: HashMap::new(),
            stats: Stats::default(),
        }
    }

    pub fn parameters(&self) -> &SolverParameters {
        &self.params
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn log_stats(&self) {
        log::debug!(
            "solver stats: {} constraints, {} demon runs, {} failures",
            self.stats.constraints,
            self.stats.demon_runs,
            self.stats.failures
        );
    }

    // =========== Variable factories ===========

    pub fn new_int_var(&mut self, min: IntCst, max: IntCst, name: impl Into<String>) -> VarRef {
        self.state.new_var(min, max, name)
    }

    pub fn new_bool_var(&mut self, name: impl Into<String>) -> VarRef {
        self.state.new_var(0, 1, name)
    }

    pub fn new_const(&mut self, value: IntCst) -> VarRef {
        if let Some(&v) = self.constants.get(&value) {
            return v;
        }
        let v = self.state.new_var(value, value, value.to_string());
        self.constants.insert(value, v);
        v
    }

    // =========== Constraint plumbing ===========

    /// Posts `c`, runs its initial propagation, then drains the queue to
    /// the fixpoint.
    pub fn add_constraint(&mut self, c: Box<dyn Constraint>) -> SolverResult<ConstraintId> {
        let id = self.constraints.push(RefCell::new(c));
        self.stats.constraints += 1;
        let mut deferred: Vec<Box<dyn Constraint>> = Vec::new();
        let mut ct = self.constraints[id].borrow_mut();
        let mut ctx = PostCtx::new(&mut self.state, id, &mut deferred);
        ct.post(&mut ctx);
        let seeded = ct.initial_propagate(&mut self.state);
        drop(ct);
        if seeded.is_err() {
            self.on_fail();
            return Err(Failure);
        }
        for extra in deferred {
            self.add_constraint(extra)?;
        }
        self.propagate()?;
        Ok(id)
    }

    /// Drains the propagation queue until it is empty or a contradiction
    /// is found. On failure the queue is cleared before returning, so no
    /// demon can observe partially propagated state.
    pub fn propagate(&mut self) -> SolverResult<()> {
        if self.state.queue_frozen() {
            return Ok(());
        }
        let result = self.drain_queue();
        if result.is_err() {
            self.on_fail();
        }
        result
    }

    fn drain_queue(&mut self) -> SolverResult<()> {
        while let Some(item) = self.state.queue.pop() {
            match item {
                QueueItem::Handler(Entity::Var(v)) => self.process_var(v)?,
                QueueItem::Handler(Entity::Interval(i)) => self.process_interval(i)?,
                QueueItem::Demon(d) => self.exec_demon(d)?,
            }
        }
        Ok(())
    }

    fn process_var(&mut self, v: VarRef) -> SolverResult<()> {
        let fired = self.state.begin_var_process(v);
        for d in fired.delay {
            self.state.enqueue_demon(d);
        }
        for d in fired.run {
            self.exec_demon(d)?;
        }
        self.state.end_var_process(v)
    }

    fn process_interval(&mut self, i: IntervalId) -> SolverResult<()> {
        let fired = self.state.begin_interval_process(i);
        for d in fired.delay {
            self.state.enqueue_demon(d);
        }
        for d in fired.run {
            self.exec_demon(d)?;
        }
        self.state.end_interval_process(i)
    }

    fn exec_demon(&mut self, d: DemonId) -> SolverResult<()> {
        let Some((cid, tag)) = self.state.demon_popped(d) else {
            return Ok(());
        };
        self.stats.demon_runs += 1;
        let mut c = self.constraints[cid].borrow_mut();
        c.run(&mut self.state, tag)
    }

    fn on_fail(&mut self) {
        self.stats.failures += 1;
        self.state.clear_queue_on_fail();
    }

    /// Suspends queue draining; batches of updates applied under a frozen
    /// queue are propagated atomically when the queue is unfrozen.
    pub fn freeze_queue(&mut self) {
        self.state.freeze_queue();
    }

    pub fn unfreeze_queue(&mut self) -> SolverResult<()> {
        if self.state.queue.unfreeze() {
            self.propagate()
        } else {
            Ok(())
        }
    }

    // =========== Aggregate expression factories ===========

    fn all_booleans(&self, vars: &[VarRef]) -> bool {
        vars.iter().all(|&v| self.state.min(v) >= 0 && self.state.max(v) <= 1)
    }

    /// Variable constrained to `sum(vars)`.
    pub fn make_sum(&mut self, vars: &[VarRef]) -> SolverResult<VarRef> {
        match vars.len() {
            0 => Ok(self.new_const(0)),
            1 => Ok(vars[0]),
            _ => {
                if let Some(cached) = self.cache.find_var_array_expression(ExprOp::Sum, vars) {
                    return Ok(cached);
                }
                let mut new_min: IntCst = 0;
                let mut new_max: IntCst = 0;
                for &v in vars {
                    if new_min != INT_CST_MIN {
                        new_min = cap_add(new_min, self.state.min(v));
                    }
                    if new_max != INT_CST_MAX {
                        new_max = cap_add(new_max, self.state.max(v));
                    }
                }
                let all_booleans = self.all_booleans(vars);
                let name = if all_booleans {
                    format!("BooleanSum({} vars)", vars.len())
                } else {
                    format!("Sum({} vars)", vars.len())
                };
                let sum_var = self.state.new_var(new_min, new_max, name);
                let block = self.params.array_split_size;
                if all_booleans {
                    self.add_constraint(Box::new(SumBooleanEqualToVar::new(vars.to_vec(), sum_var)))?;
                } else if detect_sum_overflow(&self.state, vars) {
                    self.add_constraint(Box::new(SafeSumConstraint::new(vars.to_vec(), sum_var, block)))?;
                } else {
                    self.add_constraint(Box::new(SumConstraint::new(vars.to_vec(), sum_var, block)))?;
                }
                self.cache.insert_var_array_expression(ExprOp::Sum, vars, sum_var);
                Ok(sum_var)
            }
        }
    }

    /// Variable constrained to `min(vars)`.
    pub fn make_min(&mut self, vars: &[VarRef]) -> SolverResult<VarRef> {
        match vars.len() {
            0 => Ok(self.new_const(0)),
            1 => Ok(vars[0]),
            _ => {
                if let Some(cached) = self.cache.find_var_array_expression(ExprOp::Min, vars) {
                    return Ok(cached);
                }
                let target = if self.all_booleans(vars) {
                    let target = self.new_bool_var(format!("BooleanMin({} vars)", vars.len()));
                    self.add_constraint(Box::new(ArrayBoolAndEq::new(vars.to_vec(), target)))?;
                    target
                } else {
                    let new_min = vars.iter().map(|&v| self.state.min(v)).min().unwrap();
                    let new_max = vars.iter().map(|&v| self.state.max(v)).min().unwrap();
                    let target = self.state.new_var(new_min, new_max, format!("Min({} vars)", vars.len()));
                    let block = self.params.array_split_size;
                    self.add_constraint(Box::new(MinConstraint::new(vars.to_vec(), target, block)))?;
                    target
                };
                self.cache.insert_var_array_expression(ExprOp::Min, vars, target);
                Ok(target)
            }
        }
    }

    /// Variable constrained to `max(vars)`.
    pub fn make_max(&mut self, vars: &[VarRef]) -> SolverResult<VarRef> {
        match vars.len() {
            0 => Ok(self.new_const(0)),
            1 => Ok(vars[0]),
            _ => {
                if let Some(cached) = self.cache.find_var_array_expression(ExprOp::Max, vars) {
                    return Ok(cached);
                }
                let target = if self.all_booleans(vars) {
                    let target = self.new_bool_var(format!("BooleanMax({} vars)", vars.len()));
                    self.add_constraint(Box::new(ArrayBoolOrEq::new(vars.to_vec(), target)))?;
                    target
                } else {
                    let new_min = vars.iter().map(|&v| self.state.min(v)).max().unwrap();
                    let new_max = vars.iter().map(|&v| self.state.max(v)).max().unwrap();
                    let target = self.state.new_var(new_min, new_max, format!("Max({} vars)", vars.len()));
                    let block = self.params.array_split_size;
                    self.add_constraint(Box::new(MaxConstraint::new(vars.to_vec(), target, block)))?;
                    target
                };
                self.cache.insert_var_array_expression(ExprOp::Max, vars, target);
                Ok(target)
            }
        }
    }

    /// Variable constrained to `sum(coefs[i] * vars[i])` over booleans
    /// with non-negative coefficients.
    ///
    /// # Panics
    /// Panics if the arrays have mismatched lengths, a variable is not
    /// boolean or a coefficient is negative.
    pub fn make_scal_prod(&mut self, vars: &[VarRef], coefs: &[IntCst]) -> SolverResult<VarRef> {
        assert_eq!(vars.len(), coefs.len(), "one coefficient per variable is required");
        assert!(
            self.all_booleans(vars) && coefs.iter().all(|&c| c >= 0),
            "only boolean scalar products with non-negative coefficients are supported"
        );
        if let Some(cached) = self.cache.find_var_array_constant_array_expression(ExprOp::ScalProd, vars, coefs) {
            return Ok(cached);
        }
        let mut sorted_vars = vars.to_vec();
        let mut sorted_coefs = coefs.to_vec();
        let constant = sort_coefficients(&self.state, &mut sorted_vars, &mut sorted_coefs);
        if constant != 0 {
            // Keep the absorbed constant inside the product as 1 * constant.
            let one = self.new_const(1);
            let at = sorted_coefs.partition_point(|&c| c < constant);
            sorted_vars.insert(at, one);
            sorted_coefs.insert(at, constant);
        }
        let vmin: IntCst = sorted_vars
            .iter()
            .zip(&sorted_coefs)
            .map(|(&v, &c)| self.state.min(v) * c)
            .sum();
        let vmax: IntCst = sorted_vars
            .iter()
            .zip(&sorted_coefs)
            .map(|(&v, &c)| self.state.max(v) * c)
            .sum();
        let target = self
            .state
            .new_var(vmin, vmax, format!("ScalProd({} vars)", vars.len()));
        if !sorted_vars.is_empty() {
            self.add_constraint(Box::new(PositiveBooleanScalProdEqVar::new(
                sorted_vars,
                sorted_coefs,
                target,
            )))?;
        }
        self.cache
            .insert_var_array_constant_array_expression(ExprOp::ScalProd, vars, coefs, target);
        Ok(target)
    }

    // =========== Constraint factories ===========

    /// `var == value`
    pub fn make_equality_cst(&mut self, var: VarRef, value: IntCst) -> SolverResult<()> {
        if self.cache.find_var_constant_constraint(CtOp::Equality, var, value).is_some() {
            return Ok(());
        }
        let id = self.add_constraint(Box::new(EqualityCst::new(var, value)))?;
        self.cache.insert_var_constant_constraint(CtOp::Equality, var, value, id);
        Ok(())
    }

    /// `left == right`
    pub fn make_equality(&mut self, left: VarRef, right: VarRef) -> SolverResult<()> {
        if self.cache.find_var_var_constraint(CtOp::Equality, left, right).is_some() {
            return Ok(());
        }
        let id = self.add_constraint(Box::new(VarEquality::new(left, right)))?;
        self.cache.insert_var_var_constraint(CtOp::Equality, left, right, id);
        Ok(())
    }

    /// `sum(vars) == cst`
    pub fn make_sum_equality_cst(&mut self, vars: &[VarRef], cst: IntCst) -> SolverResult<()> {
        if vars.is_empty() {
            return if cst == 0 { Ok(()) } else { Err(Failure) };
        }
        if self.all_booleans(vars) && vars.len() > 2 {
            if cst == 1 {
                return self.add_constraint(Box::new(SumBooleanEqualToOne::new(vars.to_vec()))).map(|_| ());
            } else if cst < 0 || cst > vars.len() as IntCst {
                return Err(Failure);
            } else {
                let target = self.new_const(cst);
                return self
                    .add_constraint(Box::new(SumBooleanEqualToVar::new(vars.to_vec(), target)))
                    .map(|_| ());
            }
        }
        let sum = self.make_sum(vars)?;
        self.make_equality_cst(sum, cst)
    }

    /// `sum(vars) == target`
    pub fn make_sum_equality(&mut self, vars: &[VarRef], target: VarRef) -> SolverResult<()> {
        if self.all_booleans(vars) && vars.len() > 2 {
            return self
                .add_constraint(Box::new(SumBooleanEqualToVar::new(vars.to_vec(), target)))
                .map(|_| ());
        }
        let sum = self.make_sum(vars)?;
        self.make_equality(sum, target)
    }

    /// `sum(vars) <= cst`
    pub fn make_sum_less_or_equal(&mut self, vars: &[VarRef], cst: IntCst) -> SolverResult<()> {
        if cst == 1 && self.all_booleans(vars) && vars.len() > 2 {
            self.add_constraint(Box::new(SumBooleanLessOrEqualToOne::new(vars.to_vec())))
                .map(|_| ())
        } else {
            let sum = self.make_sum(vars)?;
            self.add_constraint(Box::new(LessOrEqualCst::new(sum, cst))).map(|_| ())
        }
    }

    /// `sum(vars) >= cst`
    pub fn make_sum_greater_or_equal(&mut self, vars: &[VarRef], cst: IntCst) -> SolverResult<()> {
        if cst == 1 && self.all_booleans(vars) && vars.len() > 2 {
            self.add_constraint(Box::new(SumBooleanGreaterOrEqualToOne::new(vars.to_vec())))
                .map(|_| ())
        } else {
            let sum = self.make_sum(vars)?;
            self.add_constraint(Box::new(GreaterOrEqualCst::new(sum, cst))).map(|_| ())
        }
    }

    /// `min(vars) == target`
    pub fn make_min_equality(&mut self, vars: &[VarRef], target: VarRef) -> SolverResult<()> {
        match vars.len() {
            0 => self.make_equality_cst(target, 0),
            1 => self.make_equality(vars[0], target),
            _ => {
                let block = self.params.array_split_size;
                if self.all_booleans(vars) {
                    self.add_constraint(Box::new(ArrayBoolAndEq::new(vars.to_vec(), target)))
                        .map(|_| ())
                } else {
                    self.add_constraint(Box::new(MinConstraint::new(vars.to_vec(), target, block)))
                        .map(|_| ())
                }
            }
        }
    }

    /// `max(vars) == target`
    pub fn make_max_equality(&mut self, vars: &[VarRef], target: VarRef) -> SolverResult<()> {
        match vars.len() {
            0 => self.make_equality_cst(target, 0),
            1 => self.make_equality(vars[0], target),
            _ => {
                let block = self.params.array_split_size;
                if self.all_booleans(vars) {
                    self.add_constraint(Box::new(ArrayBoolOrEq::new(vars.to_vec(), target)))
                        .map(|_| ())
                } else {
                    self.add_constraint(Box::new(MaxConstraint::new(vars.to_vec(), target, block)))
                        .map(|_| ())
                }
            }
        }
    }

    /// `sum(coefs[i] * vars[i]) == cst`
    pub fn make_scal_prod_equality_cst(&mut self, vars: &[VarRef], coefs: &[IntCst], cst: IntCst) -> SolverResult<()> {
        assert_eq!(vars.len(), coefs.len(), "one coefficient per variable is required");
        assert!(
            self.all_booleans(vars) && coefs.iter().all(|&c| c >= 0),
            "only boolean scalar products with non-negative coefficients are supported"
        );
        let mut sorted_vars = vars.to_vec();
        let mut sorted_coefs = coefs.to_vec();
        let constant = sort_coefficients(&self.state, &mut sorted_vars, &mut sorted_coefs);
        if sorted_vars.is_empty() {
            return if constant == cst { Ok(()) } else { Err(Failure) };
        }
        self.add_constraint(Box::new(PositiveBooleanScalProdEqCst::new(
            sorted_vars,
            sorted_coefs,
            cst - constant,
        )))
        .map(|_| ())
    }

    /// `sum(coefs[i] * vars[i]) == target`
    pub fn make_scal_prod_equality(&mut self, vars: &[VarRef], coefs: &[IntCst], target: VarRef) -> SolverResult<()> {
        let prod = self.make_scal_prod(vars, coefs)?;
        self.make_equality(prod, target)
    }

    /// `sum(coefs[i] * vars[i]) <= cst`
    pub fn make_scal_prod_less_or_equal(
        &mut self,
        vars: &[VarRef],
        coefs: &[IntCst],
        cst: IntCst,
    ) -> SolverResult<()> {
        assert_eq!(vars.len(), coefs.len(), "one coefficient per variable is required");
        assert!(
            self.all_booleans(vars) && coefs.iter().all(|&c| c >= 0),
            "only boolean scalar products with non-negative coefficients are supported"
        );
        let mut sorted_vars = vars.to_vec();
        let mut sorted_coefs = coefs.to_vec();
        let constant = sort_coefficients(&self.state, &mut sorted_vars, &mut sorted_coefs);
        if sorted_vars.is_empty() {
            return if constant <= cst { Ok(()) } else { Err(Failure) };
        }
        self.add_constraint(Box::new(BooleanScalProdLessConstant::new(
            sorted_vars,
            sorted_coefs,
            cst - constant,
        )))
        .map(|_| ())
    }

    /// No two of the rectangles `[x_i, x_i + dx_i) × [y_i, y_i + dy_i)`
    /// may overlap.
    pub fn make_non_overlapping_rectangles(
        &mut self,
        x: &[VarRef],
        y: &[VarRef],
        dx: &[VarRef],
        dy: &[VarRef],
    ) -> SolverResult<()> {
        self.add_constraint(Box::new(Diffn::new(x.to_vec(), y.to_vec(), dx.to_vec(), dy.to_vec())))
            .map(|_| ())
    }

    /// Tasks sharing a resource of the given capacity.
    pub fn make_cumulative(
        &mut self,
        intervals: &[IntervalId],
        demands: &[IntCst],
        capacity: IntCst,
        name: impl Into<String>,
    ) -> SolverResult<()> {
        self.add_constraint(Box::new(Cumulative::new(
            intervals.to_vec(),
            demands.to_vec(),
            capacity,
            name,
        )))
        .map(|_| ())
    }

    // =========== Interval factories ===========

    pub fn make_fixed_duration_interval_var(
        &mut self,
        start_min: IntCst,
        start_max: IntCst,
        duration: IntCst,
        optional: bool,
        name: impl Into<String>,
    ) -> IntervalId {
        if start_min == start_max && !optional {
            self.state.new_fixed_interval(start_min, duration, name)
        } else {
            self.state
                .new_fixed_duration_interval(start_min, start_max, duration, optional, name)
        }
    }

    /// Always-performed interval whose start is the given variable.
    pub fn make_fixed_duration_interval_var_with_start_var(
        &mut self,
        start: VarRef,
        duration: IntCst,
        name: impl Into<String>,
    ) -> IntervalId {
        self.state.new_start_var_interval(start, duration, name)
    }

    pub fn make_fixed_interval(&mut self, start: IntCst, duration: IntCst, name: impl Into<String>) -> IntervalId {
        self.state.new_fixed_interval(start, duration, name)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn make_interval_var(
        &mut self,
        start_min: IntCst,
        start_max: IntCst,
        duration_min: IntCst,
        duration_max: IntCst,
        end_min: IntCst,
        end_max: IntCst,
        optional: bool,
        name: impl Into<String>,
    ) -> IntervalId {
        self.state.new_variable_duration_interval(
            start_min,
            start_max,
            duration_min,
            duration_max,
            end_min,
            end_max,
            optional,
            name,
        )
    }

    pub fn make_mirror_interval(&mut self, t: IntervalId) -> IntervalId {
        self.state.new_mirror_interval(t)
    }

    pub fn make_interval_relaxed_max(&mut self, t: IntervalId) -> IntervalId {
        if self.state.must_be_performed(t) {
            t
        } else {
            self.state.new_relaxed_max_interval(t)
        }
    }

    pub fn make_interval_relaxed_min(&mut self, t: IntervalId) -> IntervalId {
        if self.state.must_be_performed(t) {
            t
        } else {
            self.state.new_relaxed_min_interval(t)
        }
    }

    pub fn make_fixed_duration_start_synced_on_start_interval_var(
        &mut self,
        t: IntervalId,
        duration: IntCst,
        offset: IntCst,
    ) -> IntervalId {
        self.state.new_synced_interval(t, SyncAnchor::Start, duration, offset)
    }

    pub fn make_fixed_duration_start_synced_on_end_interval_var(
        &mut self,
        t: IntervalId,
        duration: IntCst,
        offset: IntCst,
    ) -> IntervalId {
        self.state.new_synced_interval(t, SyncAnchor::End, duration, offset)
    }

    pub fn make_fixed_duration_end_synced_on_start_interval_var(
        &mut self,
        t: IntervalId,
        duration: IntCst,
        offset: IntCst,
    ) -> IntervalId {
        self.state
            .new_synced_interval(t, SyncAnchor::Start, duration, offset - duration)
    }

    pub fn make_fixed_duration_end_synced_on_end_interval_var(
        &mut self,
        t: IntervalId,
        duration: IntCst,
        offset: IntCst,
    ) -> IntervalId {
        self.state
            .new_synced_interval(t, SyncAnchor::End, duration, offset - duration)
    }

    pub fn make_sequence(&mut self, intervals: &[IntervalId], name: impl Into<String>) -> SequenceId {
        self.state.new_sequence(intervals.to_vec(), name)
    }

    /// Empty assignment; populate it with `add` calls, then `store`.
    pub fn make_assignment(&self) -> crate::assignment::Assignment {
        crate::assignment::Assignment::new()
    }
}

impl Default for Solver {
    fn default() -> Self {
        Self::new()
    }
}

impl Backtrack for Solver {
    fn save_state(&mut self) -> u32 {
        self.cache.set_in_search(true);
        self.state.save_state()
    }

    fn num_saved(&self) -> u32 {
        self.state.num_saved()
    }

    fn restore_last(&mut self) {
        self.state.restore_last();
        if self.state.num_saved() == 0 {
            self.cache.set_in_search(false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sum_fixpoint() {
        let mut s = Solver::new();
        let a = s.new_int_var(0, 10, "a");
        let b = s.new_int_var(2, 6, "b");
        let c = s.new_int_var(1, 4, "c");
        let t = s.make_sum(&[a, b, c]).unwrap();
        assert_eq!(s.state.min(t), 3);
        assert_eq!(s.state.max(t), 20);

        s.state.set_max(t, 5).unwrap();
        s.propagate().unwrap();
        // a <= 5 - 2 - 1
        assert_eq!(s.state.max(a), 2);
    }

    #[test]
    fn test_sum_cache_dedup() {
        let mut s = Solver::new();
        let a = s.new_int_var(0, 10, "a");
        let b = s.new_int_var(0, 10, "b");
        let c = s.new_int_var(0, 10, "c");
        let t1 = s.make_sum(&[a, b, c]).unwrap();
        let t2 = s.make_sum(&[a, b, c]).unwrap();
        assert_eq!(t1, t2);
        // Inside search, a new expression is built instead.
        s.save_state();
        let t3 = s.make_sum(&[a, c, b]).unwrap();
        assert_ne!(t1, t3);
    }

    #[test]
    fn test_boolean_max_is_or() {
        let mut s = Solver::new();
        let bools: Vec<_> = (0..4).map(|i| s.new_bool_var(format!("b{i}"))).collect();
        let t = s.make_max(&bools).unwrap();
        s.state.set_min(t, 1).unwrap();
        s.propagate().unwrap();
        for &b in &bools[..3] {
            s.state.set_max(b, 0).unwrap();
            s.propagate().unwrap();
        }
        assert_eq!(s.state.min(bools[3]), 1);
    }

    #[test]
    fn test_backtrack_restores_solver() {
        let mut s = Solver::new();
        let a = s.new_int_var(0, 10, "a");
        let b = s.new_int_var(0, 10, "b");
        let t = s.make_sum(&[a, b]).unwrap();
        let lvl = s.save_state();
        s.state.set_min(a, 8).unwrap();
        s.propagate().unwrap();
        assert_eq!(s.state.min(t), 8);
        s.restore(lvl);
        assert_eq!(s.state.min(t), 0);
        assert_eq!(s.state.min(a), 0);
    }

    #[test]
    fn test_infeasible_sum_fails() {
        let mut s = Solver::new();
        let a = s.new_int_var(0, 2, "a");
        let b = s.new_int_var(0, 2, "b");
        assert_eq!(s.make_sum_equality_cst(&[a, b], 10), Err(Failure));
    }
}
