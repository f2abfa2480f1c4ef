//! Tree-structured `min(vars) == target` and `max(vars) == target`.
//!
//! Same k-ary tree as the sum constraints, except that a leaf change
//! recomputes its ancestors (an aggregate min/max cannot be maintained by
//! deltas) and a target change identifies whether a single child can
//! still support the new bound before pushing it down.

use crate::constraints::sum::{TreeArray, TARGET_TAG};
use crate::constraints::{Constraint, PostCtx};
use crate::core::state::{DemonPriority, State};
use crate::core::{Failure, IntCst, SolverResult, VarRef};
use crate::core::{INT_CST_MAX, INT_CST_MIN};

/// `min(vars) == target`
pub struct MinConstraint {
    vars: Vec<VarRef>,
    target: VarRef,
    block_size: usize,
    tree: Option<TreeArray>,
}

impl MinConstraint {
    pub fn new(vars: Vec<VarRef>, target: VarRef, block_size: usize) -> Self {
        MinConstraint {
            vars,
            target,
            block_size,
            tree: None,
        }
    }

    fn tree(&self) -> &TreeArray {
        self.tree.as_ref().expect("constraint not posted")
    }

    fn min_var_changed(&self, state: &mut State) -> SolverResult<()> {
        let (t_min, t_max) = (state.min(self.target), state.max(self.target));
        self.push_down(state, 0, 0, t_min, t_max)
    }

    fn push_down(
        &self,
        state: &mut State,
        depth: usize,
        position: usize,
        new_min: IntCst,
        new_max: IntCst,
    ) -> SolverResult<()> {
        let tree = self.tree();
        if new_min <= tree.min(state, depth, position) && new_max >= tree.max(state, depth, position) {
            return Ok(());
        }

        if tree.is_leaf(depth) {
            return state.set_range(self.vars[position], new_min, new_max).map(|_| ());
        }

        let node_min = tree.min(state, depth, position);
        let node_max = tree.max(state, depth, position);

        let mut candidate = None;
        let mut active = 0;
        let block_start = tree.child_start(position);
        let block_end = tree.child_end(depth, position);

        if new_max < node_max {
            // Look for the only child that can support the new max.
            for i in block_start..=block_end {
                if tree.min(state, depth + 1, i) <= new_max {
                    active += 1;
                    if active > 1 {
                        break;
                    }
                    candidate = Some(i);
                }
            }
            if active == 0 {
                return Err(Failure);
            }
        }

        if node_min < new_min {
            for i in block_start..=block_end {
                if Some(i) == candidate && active == 1 {
                    self.push_down(state, depth + 1, i, new_min, new_max)?;
                } else {
                    let child_max = tree.max(state, depth + 1, i);
                    self.push_down(state, depth + 1, i, new_min, child_max)?;
                }
            }
        } else if active == 1 {
            let i = candidate.unwrap();
            let child_min = tree.min(state, depth + 1, i);
            self.push_down(state, depth + 1, i, child_min, new_max)?;
        }
        Ok(())
    }

    fn leaf_changed(&self, state: &mut State, index: usize) -> SolverResult<()> {
        let var = self.vars[index];
        let tree = self.tree();
        let (var_min, var_max) = (state.min(var), state.max(var));
        tree.set_range(state, tree.max_depth(), index, var_min, var_max);
        self.push_up(state, index)
    }

    fn push_up(&self, state: &mut State, position: usize) -> SolverResult<()> {
        let tree = self.tree();
        let mut position = position;
        let mut depth = tree.max_depth();
        while depth > 0 {
            let parent = tree.parent(position);
            let parent_depth = depth - 1;
            let mut min_min = INT_CST_MAX;
            let mut min_max = INT_CST_MAX;
            for k in tree.child_start(parent)..=tree.child_end(parent_depth, parent) {
                min_min = min_min.min(tree.min(state, depth, k));
                min_max = min_max.min(tree.max(state, depth, k));
            }
            if min_min > tree.min(state, parent_depth, parent) || min_max < tree.max(state, parent_depth, parent) {
                tree.set_range(state, parent_depth, parent, min_min, min_max);
            } else {
                break;
            }
            depth = parent_depth;
            position = parent;
        }
        if depth == 0 {
            // We have pushed all the way up.
            state.set_range(self.target, tree.root_min(state), tree.root_max(state))?;
        }
        self.min_var_changed(state)
    }
}

impl Constraint for MinConstraint {
    fn name(&self) -> String {
        format!("Min({} vars) == {:?}", self.vars.len(), self.target)
    }

    fn post(&mut self, ctx: &mut PostCtx) {
        self.tree = Some(TreeArray::new(ctx.state, self.vars.len(), self.block_size));
        for (i, &v) in self.vars.iter().enumerate() {
            let d = ctx.demon(i as u32, DemonPriority::Normal);
            ctx.state.when_range(v, d);
        }
        let min_demon = ctx.demon(TARGET_TAG, DemonPriority::Delayed);
        ctx.state.when_range(self.target, min_demon);
    }

    fn initial_propagate(&mut self, state: &mut State) -> SolverResult<()> {
        let tree = self.tree();
        for (i, &v) in self.vars.iter().enumerate() {
            let (var_min, var_max) = (state.min(v), state.max(v));
            tree.init_node(state, tree.max_depth(), i, var_min, var_max);
        }
        for depth in (0..tree.max_depth()).rev() {
            for j in 0..tree.width(depth) {
                let mut min_min = INT_CST_MAX;
                let mut min_max = INT_CST_MAX;
                for k in tree.child_start(j)..=tree.child_end(depth, j) {
                    min_min = min_min.min(tree.min(state, depth + 1, k));
                    min_max = min_max.min(tree.max(state, depth + 1, k));
                }
                tree.init_node(state, depth, j, min_min, min_max);
            }
        }
        state.set_range(self.target, tree.root_min(state), tree.root_max(state))?;
        self.min_var_changed(state)
    }

    fn run(&mut self, state: &mut State, tag: u32) -> SolverResult<()> {
        if tag == TARGET_TAG {
            self.min_var_changed(state)
        } else {
            self.leaf_changed(state, tag as usize)
        }
    }
}

/// `max(vars) == target`
pub struct MaxConstraint {
    vars: Vec<VarRef>,
    target: VarRef,
    block_size: usize,
    tree: Option<TreeArray>,
}

impl MaxConstraint {
    pub fn new(vars: Vec<VarRef>, target: VarRef, block_size: usize) -> Self {
        MaxConstraint {
            vars,
            target,
            block_size,
            tree: None,
        }
    }

    fn tree(&self) -> &TreeArray {
        self.tree.as_ref().expect("constraint not posted")
    }

    fn max_var_changed(&self, state: &mut State) -> SolverResult<()> {
        let (t_min, t_max) = (state.min(self.target), state.max(self.target));
        self.push_down(state, 0, 0, t_min, t_max)
    }

    fn push_down(
        &self,
        state: &mut State,
        depth: usize,
        position: usize,
        new_min: IntCst,
        new_max: IntCst,
    ) -> SolverResult<()> {
        let tree = self.tree();
        if new_min <= tree.min(state, depth, position) && new_max >= tree.max(state, depth, position) {
            return Ok(());
        }

        if tree.is_leaf(depth) {
            return state.set_range(self.vars[position], new_min, new_max).map(|_| ());
        }

        let node_min = tree.min(state, depth, position);
        let node_max = tree.max(state, depth, position);

        let mut candidate = None;
        let mut active = 0;
        let block_start = tree.child_start(position);
        let block_end = tree.child_end(depth, position);

        if node_min < new_min {
            // Look for the only child that can support the new min.
            for i in block_start..=block_end {
                if tree.max(state, depth + 1, i) >= new_min {
                    active += 1;
                    if active > 1 {
                        break;
                    }
                    candidate = Some(i);
                }
            }
            if active == 0 {
                return Err(Failure);
            }
        }

        if node_max > new_max {
            for i in block_start..=block_end {
                if Some(i) == candidate && active == 1 {
                    self.push_down(state, depth + 1, i, new_min, new_max)?;
                } else {
                    let child_min = tree.min(state, depth + 1, i);
                    self.push_down(state, depth + 1, i, child_min, new_max)?;
                }
            }
        } else if active == 1 {
            let i = candidate.unwrap();
            let child_max = tree.max(state, depth + 1, i);
            self.push_down(state, depth + 1, i, new_min, child_max)?;
        }
        Ok(())
    }

    fn leaf_changed(&self, state: &mut State, index: usize) -> SolverResult<()> {
        let var = self.vars[index];
        let tree = self.tree();
        let (var_min, var_max) = (state.min(var), state.max(var));
        tree.set_range(state, tree.max_depth(), index, var_min, var_max);
        self.push_up(state, index)
    }

    fn push_up(&self, state: &mut State, position: usize) -> SolverResult<()> {
        let tree = self.tree();
        let mut position = position;
        let mut depth = tree.max_depth();
        while depth > 0 {
            let parent = tree.parent(position);
            let parent_depth = depth - 1;
            let mut max_min = INT_CST_MIN;
            let mut max_max = INT_CST_MIN;
            for k in tree.child_start(parent)..=tree.child_end(parent_depth, parent) {
                max_min = max_min.max(tree.min(state, depth, k));
                max_max = max_max.max(tree.max(state, depth, k));
            }
            if max_min > tree.min(state, parent_depth, parent) || max_max < tree.max(state, parent_depth, parent) {
                tree.set_range(state, parent_depth, parent, max_min, max_max);
            } else {
                break;
            }
            depth = parent_depth;
            position = parent;
        }
        if depth == 0 {
            state.set_range(self.target, tree.root_min(state), tree.root_max(state))?;
        }
        self.max_var_changed(state)
    }
}

impl Constraint for MaxConstraint {
    fn name(&self) -> String {
        format!("Max({} vars) == {:?}", self.vars.len(), self.target)
    }

    fn post(&mut self, ctx: &mut PostCtx) {
        self.tree = Some(TreeArray::new(ctx.state, self.vars.len(), self.block_size));
        for (i, &v) in self.vars.iter().enumerate() {
            let d = ctx.demon(i as u32, DemonPriority::Normal);
            ctx.state.when_range(v, d);
        }
        let max_demon = ctx.demon(TARGET_TAG, DemonPriority::Delayed);
        ctx.state.when_range(self.target, max_demon);
    }

    fn initial_propagate(&mut self, state: &mut State) -> SolverResult<()> {
        let tree = self.tree();
        for (i, &v) in self.vars.iter().enumerate() {
            let (var_min, var_max) = (state.min(v), state.max(v));
            tree.init_node(state, tree.max_depth(), i, var_min, var_max);
        }
        for depth in (0..tree.max_depth()).rev() {
            for j in 0..tree.width(depth) {
                let mut max_min = INT_CST_MIN;
                let mut max_max = INT_CST_MIN;
                for k in tree.child_start(j)..=tree.child_end(depth, j) {
                    max_min = max_min.max(tree.min(state, depth + 1, k));
                    max_max = max_max.max(tree.max(state, depth + 1, k));
                }
                tree.init_node(state, depth, j, max_min, max_max);
            }
        }
        state.set_range(self.target, tree.root_min(state), tree.root_max(state))?;
        self.max_var_changed(state)
    }

    fn run(&mut self, state: &mut State, tag: u32) -> SolverResult<()> {
        if tag == TARGET_TAG {
            self.max_var_changed(state)
        } else {
            self.leaf_changed(state, tag as usize)
        }
    }
}
