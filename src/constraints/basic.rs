//! Small glue constraints used by the factories.

use crate::constraints::{Constraint, PostCtx};
use crate::core::state::{DemonPriority, State};
use crate::core::{IntCst, SolverResult, VarRef};

/// `var == value`
pub struct EqualityCst {
    var: VarRef,
    value: IntCst,
}

impl EqualityCst {
    pub fn new(var: VarRef, value: IntCst) -> Self {
        EqualityCst { var, value }
    }
}

impl Constraint for EqualityCst {
    fn name(&self) -> String {
        format!("{:?} == {}", self.var, self.value)
    }

    fn post(&mut self, _ctx: &mut PostCtx) {
        // Once the variable is fixed, any conflicting setter fails on its
        // own; no demon is needed.
    }

    fn initial_propagate(&mut self, state: &mut State) -> SolverResult<()> {
        state.set_value(self.var, self.value).map(|_| ())
    }

    fn run(&mut self, _state: &mut State, _tag: u32) -> SolverResult<()> {
        unreachable!("EqualityCst posts no demon")
    }
}

/// `var >= value`
pub struct GreaterOrEqualCst {
    var: VarRef,
    value: IntCst,
}

impl GreaterOrEqualCst {
    pub fn new(var: VarRef, value: IntCst) -> Self {
        GreaterOrEqualCst { var, value }
    }
}

impl Constraint for GreaterOrEqualCst {
    fn name(&self) -> String {
        format!("{:?} >= {}", self.var, self.value)
    }

    fn post(&mut self, _ctx: &mut PostCtx) {}

    fn initial_propagate(&mut self, state: &mut State) -> SolverResult<()> {
        state.set_min(self.var, self.value).map(|_| ())
    }

    fn run(&mut self, _state: &mut State, _tag: u32) -> SolverResult<()> {
        unreachable!("GreaterOrEqualCst posts no demon")
    }
}

/// `var <= value`
pub struct LessOrEqualCst {
    var: VarRef,
    value: IntCst,
}

impl LessOrEqualCst {
    pub fn new(var: VarRef, value: IntCst) -> Self {
        LessOrEqualCst { var, value }
    }
}

impl Constraint for LessOrEqualCst {
    fn name(&self) -> String {
        format!("{:?} <= {}", self.var, self.value)
    }

    fn post(&mut self, _ctx: &mut PostCtx) {}

    fn initial_propagate(&mut self, state: &mut State) -> SolverResult<()> {
        state.set_max(self.var, self.value).map(|_| ())
    }

    fn run(&mut self, _state: &mut State, _tag: u32) -> SolverResult<()> {
        unreachable!("LessOrEqualCst posts no demon")
    }
}

/// `left == right`, by two-way bound propagation.
pub struct VarEquality {
    left: VarRef,
    right: VarRef,
}

impl VarEquality {
    pub fn new(left: VarRef, right: VarRef) -> Self {
        VarEquality { left, right }
    }

    fn sync(&self, state: &mut State) -> SolverResult<()> {
        state.set_range(self.right, state.min(self.left), state.max(self.left))?;
        state.set_range(self.left, state.min(self.right), state.max(self.right))?;
        Ok(())
    }
}

impl Constraint for VarEquality {
    fn name(&self) -> String {
        format!("{:?} == {:?}", self.left, self.right)
    }

    fn post(&mut self, ctx: &mut PostCtx) {
        let d0 = ctx.demon(0, DemonPriority::Normal);
        ctx.state.when_range(self.left, d0);
        let d1 = ctx.demon(1, DemonPriority::Normal);
        ctx.state.when_range(self.right, d1);
    }

    fn initial_propagate(&mut self, state: &mut State) -> SolverResult<()> {
        self.sync(state)
    }

    fn run(&mut self, state: &mut State, _tag: u32) -> SolverResult<()> {
        self.sync(state)
    }
}
