//! Scalar products of boolean variables with non-negative coefficients.
//!
//! Terms are sorted by increasing coefficient and variables already bound
//! are absorbed into the constant. The reversible state is the sum of the
//! coefficients of variables bound to 1, the sum over all variables that
//! may still be 1, and the largest index still unbound; pruning walks
//! that index downward while the coefficient exceeds one of the slacks.

use crate::constraints::{Constraint, PostCtx};
use crate::core::state::{DemonPriority, State};
use crate::core::{CellId, Failure, IntCst, SolverResult, VarRef};
use itertools::Itertools;

pub(crate) const TARGET_TAG: u32 = u32::MAX;

/// Sorts `(var, coef)` pairs by ascending coefficient, dropping null
/// coefficients and absorbing bound variables. Returns the absorbed
/// constant.
pub(crate) fn sort_coefficients(
    state: &State,
    vars: &mut Vec<VarRef>,
    coefs: &mut Vec<IntCst>,
) -> IntCst {
    let mut constant = 0;
    let mut sorted: Vec<(VarRef, IntCst)> = Vec::with_capacity(vars.len());
    for (&v, &c) in vars.iter().zip(coefs.iter()) {
        if state.bound(v) {
            constant += c * state.value(v);
        } else if c != 0 {
            sorted.push((v, c));
        }
    }
    let sorted = sorted.into_iter().sorted_by_key(|&(_, c)| c).collect_vec();
    *vars = sorted.iter().map(|&(v, _)| v).collect();
    *coefs = sorted.iter().map(|&(_, c)| c).collect();
    constant
}

/// `sum(coefs[i] * vars[i]) <= upper_bound`
pub struct BooleanScalProdLessConstant {
    vars: Vec<VarRef>,
    coefs: Vec<IntCst>,
    upper_bound: IntCst,
    first_unbound_backward: Option<CellId>,
    sum_of_bound: Option<CellId>,
    max_coefficient: Option<CellId>,
}

impl BooleanScalProdLessConstant {
    /// `vars` and `coefs` must have been preprocessed with
    /// [`sort_coefficients`], the absorbed constant subtracted from the
    /// bound.
    pub fn new(vars: Vec<VarRef>, coefs: Vec<IntCst>, upper_bound: IntCst) -> Self {
        debug_assert!(coefs.iter().all(|&c| c >= 0));
        BooleanScalProdLessConstant {
            vars,
            coefs,
            upper_bound,
            first_unbound_backward: None,
            sum_of_bound: None,
            max_coefficient: None,
        }
    }

    fn push_from_top(&self, state: &mut State) -> SolverResult<()> {
        let slack = self.upper_bound - state.cell(self.sum_of_bound.unwrap());
        if slack < 0 {
            return Err(Failure);
        }
        if slack < state.cell(self.max_coefficient.unwrap()) {
            let mut last_unbound = state.cell(self.first_unbound_backward.unwrap());
            while last_unbound >= 0 {
                let index = last_unbound as usize;
                if !state.bound(self.vars[index]) {
                    if self.coefs[index] <= slack {
                        state.set_cell(self.max_coefficient.unwrap(), self.coefs[index]);
                        break;
                    } else {
                        state.set_value(self.vars[index], 0)?;
                    }
                }
                last_unbound -= 1;
            }
            state.set_cell(self.first_unbound_backward.unwrap(), last_unbound);
        }
        Ok(())
    }
}

impl Constraint for BooleanScalProdLessConstant {
    fn name(&self) -> String {
        format!("BooleanScalProd({} vars) <= {}", self.vars.len(), self.upper_bound)
    }

    fn post(&mut self, ctx: &mut PostCtx) {
        self.first_unbound_backward = Some(ctx.state.new_cell(self.vars.len() as IntCst - 1));
        self.sum_of_bound = Some(ctx.state.new_cell(0));
        self.max_coefficient = Some(ctx.state.new_cell(self.coefs.last().copied().unwrap_or(0)));
        for (i, &v) in self.vars.iter().enumerate() {
            if !ctx.state.bound(v) {
                let d = ctx.demon(i as u32, DemonPriority::Normal);
                ctx.state.when_range(v, d);
            }
        }
    }

    fn initial_propagate(&mut self, state: &mut State) -> SolverResult<()> {
        let mut last_unbound: IntCst = -1;
        let mut sum: IntCst = 0;
        for (i, &v) in self.vars.iter().enumerate() {
            if state.bound(v) {
                sum += state.value(v) * self.coefs[i];
            } else {
                last_unbound = i as IntCst;
            }
        }
        state.set_cell(self.sum_of_bound.unwrap(), sum);
        state.set_cell(self.first_unbound_backward.unwrap(), last_unbound);
        self.push_from_top(state)
    }

    fn run(&mut self, state: &mut State, tag: u32) -> SolverResult<()> {
        let index = tag as usize;
        if state.min(self.vars[index]) == 1 {
            state.add_cell(self.sum_of_bound.unwrap(), self.coefs[index]);
            self.push_from_top(state)?;
        }
        Ok(())
    }
}

/// Common propagation of the `== var` and `== constant` forms: walk the
/// unbound variables from the largest coefficient down while it exceeds
/// the upward or downward slack.
struct ScalProdState {
    first_unbound_backward: CellId,
    sum_of_bound: CellId,
    sum_of_all: CellId,
    max_coefficient: CellId,
}

impl ScalProdState {
    fn alloc(state: &mut State, size: usize, max_coef: IntCst) -> ScalProdState {
        ScalProdState {
            first_unbound_backward: state.new_cell(size as IntCst - 1),
            sum_of_bound: state.new_cell(0),
            sum_of_all: state.new_cell(0),
            max_coefficient: state.new_cell(max_coef),
        }
    }

    fn init(&self, state: &mut State, vars: &[VarRef], coefs: &[IntCst]) {
        let mut last_unbound: IntCst = -1;
        let mut sum_bound: IntCst = 0;
        let mut sum_all: IntCst = 0;
        for (i, &v) in vars.iter().enumerate() {
            let value = state.max(v) * coefs[i];
            sum_all += value;
            if state.bound(v) {
                sum_bound += value;
            } else {
                last_unbound = i as IntCst;
            }
        }
        state.set_cell(self.sum_of_bound, sum_bound);
        state.set_cell(self.sum_of_all, sum_all);
        state.set_cell(self.first_unbound_backward, last_unbound);
    }

    fn update(&self, state: &mut State, vars: &[VarRef], coefs: &[IntCst], index: usize) {
        if state.min(vars[index]) == 1 {
            state.add_cell(self.sum_of_bound, coefs[index]);
        } else {
            state.add_cell(self.sum_of_all, -coefs[index]);
        }
    }

    fn walk(
        &self,
        state: &mut State,
        vars: &[VarRef],
        coefs: &[IntCst],
        slack_up: IntCst,
        slack_down: IntCst,
    ) -> SolverResult<()> {
        let max_coef = state.cell(self.max_coefficient);
        if slack_down < max_coef || slack_up < max_coef {
            let mut last_unbound = state.cell(self.first_unbound_backward);
            while last_unbound >= 0 {
                let index = last_unbound as usize;
                if !state.bound(vars[index]) {
                    if coefs[index] > slack_up {
                        state.set_value(vars[index], 0)?;
                    } else if coefs[index] > slack_down {
                        state.set_value(vars[index], 1)?;
                    } else {
                        state.set_cell(self.max_coefficient, coefs[index]);
                        break;
                    }
                }
                last_unbound -= 1;
            }
            state.set_cell(self.first_unbound_backward, last_unbound);
        }
        Ok(())
    }
}

/// `sum(coefs[i] * vars[i]) == target`
pub struct PositiveBooleanScalProdEqVar {
    vars: Vec<VarRef>,
    coefs: Vec<IntCst>,
    target: VarRef,
    rev: Option<ScalProdState>,
}

impl PositiveBooleanScalProdEqVar {
    pub fn new(vars: Vec<VarRef>, coefs: Vec<IntCst>, target: VarRef) -> Self {
        debug_assert!(coefs.iter().all(|&c| c >= 0));
        PositiveBooleanScalProdEqVar {
            vars,
            coefs,
            target,
            rev: None,
        }
    }

    fn propagate(&self, state: &mut State) -> SolverResult<()> {
        let rev = self.rev.as_ref().expect("constraint not posted");
        state.set_range(self.target, state.cell(rev.sum_of_bound), state.cell(rev.sum_of_all))?;
        let slack_up = state.max(self.target) - state.cell(rev.sum_of_bound);
        let slack_down = state.cell(rev.sum_of_all) - state.min(self.target);
        rev.walk(state, &self.vars, &self.coefs, slack_up, slack_down)
    }
}

impl Constraint for PositiveBooleanScalProdEqVar {
    fn name(&self) -> String {
        format!("PositiveBooleanScalProd({} vars) == {:?}", self.vars.len(), self.target)
    }

    fn post(&mut self, ctx: &mut PostCtx) {
        let max_coef = self.coefs.last().copied().unwrap_or(0);
        self.rev = Some(ScalProdState::alloc(ctx.state, self.vars.len(), max_coef));
        for (i, &v) in self.vars.iter().enumerate() {
            if !ctx.state.bound(v) {
                let d = ctx.demon(i as u32, DemonPriority::Normal);
                ctx.state.when_range(v, d);
            }
        }
        if !ctx.state.bound(self.target) {
            let d = ctx.demon(TARGET_TAG, DemonPriority::Normal);
            ctx.state.when_range(self.target, d);
        }
    }

    fn initial_propagate(&mut self, state: &mut State) -> SolverResult<()> {
        let rev = self.rev.as_ref().expect("constraint not posted");
        rev.init(state, &self.vars, &self.coefs);
        self.propagate(state)
    }

    fn run(&mut self, state: &mut State, tag: u32) -> SolverResult<()> {
        if tag != TARGET_TAG {
            let rev = self.rev.as_ref().expect("constraint not posted");
            rev.update(state, &self.vars, &self.coefs, tag as usize);
        }
        self.propagate(state)
    }
}

/// `sum(coefs[i] * vars[i]) == constant`
pub struct PositiveBooleanScalProdEqCst {
    vars: Vec<VarRef>,
    coefs: Vec<IntCst>,
    constant: IntCst,
    rev: Option<ScalProdState>,
}

impl PositiveBooleanScalProdEqCst {
    pub fn new(vars: Vec<VarRef>, coefs: Vec<IntCst>, constant: IntCst) -> Self {
        debug_assert!(coefs.iter().all(|&c| c >= 0));
        PositiveBooleanScalProdEqCst {
            vars,
            coefs,
            constant,
            rev: None,
        }
    }

    fn propagate(&self, state: &mut State) -> SolverResult<()> {
        let rev = self.rev.as_ref().expect("constraint not posted");
        if state.cell(rev.sum_of_bound) > self.constant || state.cell(rev.sum_of_all) < self.constant {
            return Err(Failure);
        }
        let slack_up = self.constant - state.cell(rev.sum_of_bound);
        let slack_down = state.cell(rev.sum_of_all) - self.constant;
        rev.walk(state, &self.vars, &self.coefs, slack_up, slack_down)
    }
}

impl Constraint for PositiveBooleanScalProdEqCst {
    fn name(&self) -> String {
        format!("PositiveBooleanScalProd({} vars) == {}", self.vars.len(), self.constant)
    }

    fn post(&mut self, ctx: &mut PostCtx) {
        let max_coef = self.coefs.last().copied().unwrap_or(0);
        self.rev = Some(ScalProdState::alloc(ctx.state, self.vars.len(), max_coef));
        for (i, &v) in self.vars.iter().enumerate() {
            if !ctx.state.bound(v) {
                let d = ctx.demon(i as u32, DemonPriority::Normal);
                ctx.state.when_range(v, d);
            }
        }
    }

    fn initial_propagate(&mut self, state: &mut State) -> SolverResult<()> {
        let rev = self.rev.as_ref().expect("constraint not posted");
        rev.init(state, &self.vars, &self.coefs);
        self.propagate(state)
    }

    fn run(&mut self, state: &mut State, tag: u32) -> SolverResult<()> {
        let rev = self.rev.as_ref().expect("constraint not posted");
        rev.update(state, &self.vars, &self.coefs, tag as usize);
        self.propagate(state)
    }
}
