//! Tree-structured sum constraints.
//!
//! The array of terms is laid out as the leaves of a complete k-ary tree
//! whose nodes hold the reversible `(min, max)` of their subtree sum. A
//! leaf change walks up the tree applying the positive bound deltas; a
//! target change walks down, refining each child with the residual bounds
//! of its siblings.
//!
//! Some of the filtering rules implemented here are described in "Bounds
//! consistency techniques for long linear constraints" (Beldiceanu et al.,
//! TRICS workshop of CP 2002).

use crate::constraints::{Constraint, PostCtx};
use crate::core::state::{DemonPriority, State};
use crate::core::{cap_add, cap_sub, CellId, DemonId, Failure, IntCst, SolverResult, VarRef};
use crate::core::{INT_CST_MAX, INT_CST_MIN};

pub(crate) const TARGET_TAG: u32 = u32::MAX;

struct NodeCells {
    min: CellId,
    max: CellId,
}

/// Complete k-ary tree of reversible `(min, max)` pairs. Row 0 is the
/// root; the last row holds one leaf per term.
pub(crate) struct TreeArray {
    tree: Vec<Vec<NodeCells>>,
    block_size: usize,
}

impl TreeArray {
    pub fn new(state: &mut State, size: usize, block_size: usize) -> TreeArray {
        debug_assert!(size >= 1 && block_size >= 2);
        let mut lengths = vec![size];
        while *lengths.last().unwrap() > 1 {
            let current = *lengths.last().unwrap();
            lengths.push(current.div_ceil(block_size));
        }
        let depth = lengths.len();
        let mut tree = Vec::with_capacity(depth);
        for i in 0..depth {
            let width = lengths[depth - i - 1];
            let mut row = Vec::with_capacity(width);
            for _ in 0..width {
                row.push(NodeCells {
                    min: state.new_cell(0),
                    max: state.new_cell(0),
                });
            }
            tree.push(row);
        }
        debug_assert_eq!(tree[0].len(), 1);
        TreeArray { tree, block_size }
    }

    pub fn max_depth(&self) -> usize {
        self.tree.len() - 1
    }

    pub fn is_leaf(&self, depth: usize) -> bool {
        depth == self.max_depth()
    }

    pub fn width(&self, depth: usize) -> usize {
        self.tree[depth].len()
    }

    pub fn parent(&self, position: usize) -> usize {
        position / self.block_size
    }

    pub fn child_start(&self, position: usize) -> usize {
        position * self.block_size
    }

    pub fn child_end(&self, depth: usize, position: usize) -> usize {
        debug_assert!(depth + 1 < self.tree.len());
        ((position + 1) * self.block_size - 1).min(self.width(depth + 1) - 1)
    }

    pub fn min(&self, state: &State, depth: usize, position: usize) -> IntCst {
        state.cell(self.tree[depth][position].min)
    }

    pub fn max(&self, state: &State, depth: usize, position: usize) -> IntCst {
        state.cell(self.tree[depth][position].max)
    }

    pub fn root_min(&self, state: &State) -> IntCst {
        self.min(state, 0, 0)
    }

    pub fn root_max(&self, state: &State) -> IntCst {
        self.max(state, 0, 0)
    }

    pub fn init_node(&self, state: &mut State, depth: usize, position: usize, min: IntCst, max: IntCst) {
        state.set_cell(self.tree[depth][position].min, min);
        state.set_cell(self.tree[depth][position].max, max);
    }

    /// Increases the node min by `delta_min` and decreases its max by
    /// `delta_max` (only the positive parts).
    pub fn reduce_range(&self, state: &mut State, depth: usize, position: usize, delta_min: IntCst, delta_max: IntCst) {
        let node = &self.tree[depth][position];
        if delta_min > 0 {
            state.add_cell(node.min, delta_min);
        }
        if delta_max > 0 {
            state.add_cell(node.max, -delta_max);
        }
    }

    /// Tightens the node range towards `[new_min, new_max]`.
    pub fn set_range(&self, state: &mut State, depth: usize, position: usize, new_min: IntCst, new_max: IntCst) {
        let node = &self.tree[depth][position];
        if new_min > state.cell(node.min) {
            state.set_cell(node.min, new_min);
        }
        if new_max < state.cell(node.max) {
            state.set_cell(node.max, new_max);
        }
    }
}

// ----- Sum -----

/// `sum(vars) == target`, assuming no intermediate sum can overflow.
pub struct SumConstraint {
    vars: Vec<VarRef>,
    target: VarRef,
    block_size: usize,
    tree: Option<TreeArray>,
    sum_demon: Option<DemonId>,
}

impl SumConstraint {
    pub fn new(vars: Vec<VarRef>, target: VarRef, block_size: usize) -> Self {
        SumConstraint {
            vars,
            target,
            block_size,
            tree: None,
            sum_demon: None,
        }
    }

    fn tree(&self) -> &TreeArray {
        self.tree.as_ref().expect("constraint not posted")
    }

    fn sum_changed(&self, state: &mut State) -> SolverResult<()> {
        let tree = self.tree();
        let t_max = state.max(self.target);
        let t_min = state.min(self.target);
        if t_max == tree.root_min(state) && t_max != INT_CST_MAX {
            // The sum cannot go below its current min: fix all terms.
            for &v in &self.vars {
                state.set_value(v, state.min(v))?;
            }
        } else if t_min == tree.root_max(state) && t_min != INT_CST_MIN {
            for &v in &self.vars {
                state.set_value(v, state.max(v))?;
            }
        } else {
            self.push_down(state, 0, 0, t_min, t_max)?;
        }
        Ok(())
    }

    fn push_down(
        &self,
        state: &mut State,
        depth: usize,
        position: usize,
        mut new_min: IntCst,
        mut new_max: IntCst,
    ) -> SolverResult<()> {
        let tree = self.tree();
        if new_min <= tree.min(state, depth, position) && new_max >= tree.max(state, depth, position) {
            return Ok(());
        }

        if tree.is_leaf(depth) {
            return state.set_range(self.vars[position], new_min, new_max).map(|_| ());
        }

        // These are maintained automatically in the tree structure.
        let sum_min = tree.min(state, depth, position);
        let sum_max = tree.max(state, depth, position);

        new_max = new_max.min(sum_max);
        new_min = new_min.max(sum_min);

        if new_max < sum_min || new_min > sum_max {
            return Err(Failure);
        }

        let block_start = tree.child_start(position);
        let block_end = tree.child_end(depth, position);
        for i in block_start..=block_end {
            let child_min = tree.min(state, depth + 1, i);
            let child_max = tree.max(state, depth + 1, i);
            let residual_min = sum_min - child_min;
            let residual_max = sum_max - child_max;
            self.push_down(state, depth + 1, i, new_min - residual_max, new_max - residual_min)?;
        }
        Ok(())
    }

    fn leaf_changed(&self, state: &mut State, index: usize) -> SolverResult<()> {
        let var = self.vars[index];
        let delta_min = state.min(var) - state.old_min(var);
        let delta_max = state.old_max(var) - state.max(var);
        self.push_up(state, index, delta_min, delta_max)?;
        state.enqueue_demon(self.sum_demon.expect("constraint not posted"));
        Ok(())
    }

    fn push_up(&self, state: &mut State, position: usize, delta_min: IntCst, delta_max: IntCst) -> SolverResult<()> {
        debug_assert!(delta_min >= 0 && delta_max >= 0);
        let tree = self.tree();
        let mut position = position;
        for depth in (0..=tree.max_depth()).rev() {
            tree.reduce_range(state, depth, position, delta_min, delta_max);
            position = tree.parent(position);
        }
        debug_assert_eq!(position, 0);
        state
            .set_range(self.target, tree.root_min(state), tree.root_max(state))
            .map(|_| ())
    }
}

impl Constraint for SumConstraint {
    fn name(&self) -> String {
        format!("Sum({} vars) == {:?}", self.vars.len(), self.target)
    }

    fn post(&mut self, ctx: &mut PostCtx) {
        self.tree = Some(TreeArray::new(ctx.state, self.vars.len(), self.block_size));
        for (i, &v) in self.vars.iter().enumerate() {
            let d = ctx.demon(i as u32, DemonPriority::Normal);
            ctx.state.when_range(v, d);
        }
        let sum_demon = ctx.demon(TARGET_TAG, DemonPriority::Delayed);
        ctx.state.when_range(self.target, sum_demon);
        self.sum_demon = Some(sum_demon);
    }

    fn initial_propagate(&mut self, state: &mut State) -> SolverResult<()> {
        let tree = self.tree();
        for (i, &v) in self.vars.iter().enumerate() {
            let (var_min, var_max) = (state.min(v), state.max(v));
            tree.init_node(state, tree.max_depth(), i, var_min, var_max);
        }
        for depth in (0..tree.max_depth()).rev() {
            for j in 0..tree.width(depth) {
                let mut sum_min = 0;
                let mut sum_max = 0;
                for k in tree.child_start(j)..=tree.child_end(depth, j) {
                    sum_min += tree.min(state, depth + 1, k);
                    sum_max += tree.max(state, depth + 1, k);
                }
                tree.init_node(state, depth, j, sum_min, sum_max);
            }
        }
        state.set_range(self.target, tree.root_min(state), tree.root_max(state))?;
        self.sum_changed(state)
    }

    fn run(&mut self, state: &mut State, tag: u32) -> SolverResult<()> {
        if tag == TARGET_TAG {
            self.sum_changed(state)
        } else {
            self.leaf_changed(state, tag as usize)
        }
    }
}

// ----- Safe sum -----

/// True if naively summing the bounds of `vars` hits a saturation
/// sentinel, in which case the safe variant of the constraint is needed.
pub fn detect_sum_overflow(state: &State, vars: &[VarRef]) -> bool {
    let mut sum_min: IntCst = 0;
    let mut sum_max: IntCst = 0;
    for &v in vars {
        sum_min = cap_add(sum_min, state.min(v));
        sum_max = cap_add(sum_max, state.max(v));
        if sum_min == INT_CST_MIN || sum_max == INT_CST_MAX {
            return true;
        }
    }
    false
}

/// `sum(vars) == target` with every arithmetic operation saturating.
///
/// A node whose min and max are both saturated carries no information and
/// stops propagation in that direction. During push-up, once an ancestor
/// is found unreliable the remaining nodes are recomputed from their
/// children instead of delta-updated.
pub struct SafeSumConstraint {
    vars: Vec<VarRef>,
    target: VarRef,
    block_size: usize,
    tree: Option<TreeArray>,
    sum_demon: Option<DemonId>,
}

impl SafeSumConstraint {
    pub fn new(vars: Vec<VarRef>, target: VarRef, block_size: usize) -> Self {
        SafeSumConstraint {
            vars,
            target,
            block_size,
            tree: None,
            sum_demon: None,
        }
    }

    fn tree(&self) -> &TreeArray {
        self.tree.as_ref().expect("constraint not posted")
    }

    fn safe_compute_node(&self, state: &State, depth: usize, position: usize) -> (IntCst, IntCst) {
        let tree = self.tree();
        debug_assert!(depth < tree.max_depth());
        let mut sum_min: IntCst = 0;
        let mut sum_max: IntCst = 0;
        for k in tree.child_start(position)..=tree.child_end(depth, position) {
            if sum_min != INT_CST_MIN {
                sum_min = cap_add(sum_min, tree.min(state, depth + 1, k));
            }
            if sum_max != INT_CST_MAX {
                sum_max = cap_add(sum_max, tree.max(state, depth + 1, k));
            }
            if sum_min == INT_CST_MIN && sum_max == INT_CST_MAX {
                break;
            }
        }
        (sum_min, sum_max)
    }

    fn sum_changed(&self, state: &mut State) -> SolverResult<()> {
        let tree = self.tree();
        let t_max = state.max(self.target);
        let t_min = state.min(self.target);
        if t_max == tree.root_min(state) && t_max != INT_CST_MAX {
            for &v in &self.vars {
                state.set_value(v, state.min(v))?;
            }
        } else if t_min == tree.root_max(state) && t_min != INT_CST_MIN {
            for &v in &self.vars {
                state.set_value(v, state.max(v))?;
            }
        } else {
            self.push_down(state, 0, 0, t_min, t_max)?;
        }
        Ok(())
    }

    fn push_down(
        &self,
        state: &mut State,
        depth: usize,
        position: usize,
        mut new_min: IntCst,
        mut new_max: IntCst,
    ) -> SolverResult<()> {
        let tree = self.tree();
        if new_min <= tree.min(state, depth, position) && new_max >= tree.max(state, depth, position) {
            return Ok(());
        }

        if tree.is_leaf(depth) {
            return state.set_range(self.vars[position], new_min, new_max).map(|_| ());
        }

        let sum_min = tree.min(state, depth, position);
        let sum_max = tree.max(state, depth, position);

        new_max = new_max.min(sum_max);
        new_min = new_min.max(sum_min);

        if new_max < sum_min || new_min > sum_max {
            return Err(Failure);
        }

        let block_start = tree.child_start(position);
        let block_end = tree.child_end(depth, position);
        for pos in block_start..=block_end {
            let child_min = tree.min(state, depth + 1, pos);
            let residual_min = if sum_min != INT_CST_MIN {
                cap_sub(sum_min, child_min)
            } else {
                INT_CST_MIN
            };
            let child_max = tree.max(state, depth + 1, pos);
            let residual_max = if sum_max != INT_CST_MAX {
                cap_sub(sum_max, child_max)
            } else {
                INT_CST_MAX
            };
            // A saturated residual carries no information: the push below
            // collapses to a no-op range at the child.
            let down_min = if residual_max == INT_CST_MIN {
                INT_CST_MIN
            } else {
                cap_sub(new_min, residual_max)
            };
            let down_max = if residual_min == INT_CST_MAX {
                INT_CST_MIN
            } else {
                cap_sub(new_max, residual_min)
            };
            self.push_down(state, depth + 1, pos, down_min, down_max)?;
        }
        Ok(())
    }

    fn leaf_changed(&self, state: &mut State, index: usize) -> SolverResult<()> {
        let var = self.vars[index];
        let delta_min = cap_sub(state.min(var), state.old_min(var));
        let delta_max = cap_sub(state.old_max(var), state.max(var));
        self.push_up(state, index, delta_min, delta_max)?;
        state.enqueue_demon(self.sum_demon.expect("constraint not posted"));
        Ok(())
    }

    fn push_up(&self, state: &mut State, position: usize, delta_min: IntCst, delta_max: IntCst) -> SolverResult<()> {
        let tree = self.tree();
        let mut position = position;
        let mut delta_corrupted = false;
        for depth in (0..=tree.max_depth()).rev() {
            if tree.min(state, depth, position) != INT_CST_MIN
                && tree.max(state, depth, position) != INT_CST_MAX
                && !delta_corrupted
            {
                // No overflow.
                tree.reduce_range(state, depth, position, delta_min, delta_max);
            } else if depth == tree.max_depth() {
                // Leaf.
                let var = self.vars[position];
                let (var_min, var_max) = (state.min(var), state.max(var));
                tree.set_range(state, depth, position, var_min, var_max);
                delta_corrupted = true;
            } else {
                // Recompute.
                let (sum_min, sum_max) = self.safe_compute_node(state, depth, position);
                if sum_min == INT_CST_MIN && sum_max == INT_CST_MAX {
                    // Nothing to do upward.
                    return Ok(());
                }
                tree.set_range(state, depth, position, sum_min, sum_max);
                delta_corrupted = true;
            }
            position = tree.parent(position);
        }
        debug_assert_eq!(position, 0);
        state
            .set_range(self.target, tree.root_min(state), tree.root_max(state))
            .map(|_| ())
    }
}

impl Constraint for SafeSumConstraint {
    fn name(&self) -> String {
        format!("SafeSum({} vars) == {:?}", self.vars.len(), self.target)
    }

    fn post(&mut self, ctx: &mut PostCtx) {
        self.tree = Some(TreeArray::new(ctx.state, self.vars.len(), self.block_size));
        for (i, &v) in self.vars.iter().enumerate() {
            let d = ctx.demon(i as u32, DemonPriority::Normal);
            ctx.state.when_range(v, d);
        }
        let sum_demon = ctx.demon(TARGET_TAG, DemonPriority::Delayed);
        ctx.state.when_range(self.target, sum_demon);
        self.sum_demon = Some(sum_demon);
    }

    fn initial_propagate(&mut self, state: &mut State) -> SolverResult<()> {
        let tree = self.tree();
        for (i, &v) in self.vars.iter().enumerate() {
            let (var_min, var_max) = (state.min(v), state.max(v));
            tree.init_node(state, tree.max_depth(), i, var_min, var_max);
        }
        for depth in (0..tree.max_depth()).rev() {
            for j in 0..tree.width(depth) {
                let (sum_min, sum_max) = self.safe_compute_node(state, depth, j);
                tree.init_node(state, depth, j, sum_min, sum_max);
            }
        }
        state.set_range(self.target, tree.root_min(state), tree.root_max(state))?;
        self.sum_changed(state)
    }

    fn run(&mut self, state: &mut State, tag: u32) -> SolverResult<()> {
        if tag == TARGET_TAG {
            self.sum_changed(state)
        } else {
            self.leaf_changed(state, tag as usize)
        }
    }
}
