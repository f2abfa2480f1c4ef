//! Non-overlapping rectangles.
//!
//! Each box `i` occupies `[x_i, x_i + dx_i) × [y_i, y_i + dy_i)`; no two
//! boxes may overlap. Bound-change demons only record which boxes need to
//! be reinspected; a single delayed demon drains the set and, for each
//! dirty box, checks the energy of its neighborhood and pushes boxes away
//! from its mandatory part. When every size is fixed and the positions
//! are non-negative, redundant cumulative constraints are added on both
//! axes at post time.

use crate::constraints::cumulative::Cumulative;
use crate::constraints::{Constraint, PostCtx};
use crate::core::state::{DemonPriority, State};
use crate::core::{DemonId, Failure, IntCst, SolverResult, VarRef, INT_CST_MAX};
use itertools::Itertools;
use std::collections::HashSet;

const PROPAGATE_ALL_TAG: u32 = u32::MAX;

pub struct Diffn {
    x: Vec<VarRef>,
    y: Vec<VarRef>,
    dx: Vec<VarRef>,
    dy: Vec<VarRef>,
    size: usize,
    delayed_demon: Option<DemonId>,
    to_propagate: HashSet<usize>,
    neighbors: Vec<usize>,
}

impl Diffn {
    pub fn new(x: Vec<VarRef>, y: Vec<VarRef>, dx: Vec<VarRef>, dy: Vec<VarRef>) -> Self {
        let size = x.len();
        assert_eq!(size, y.len(), "mismatched rectangle arrays");
        assert_eq!(size, dx.len(), "mismatched rectangle arrays");
        assert_eq!(size, dy.len(), "mismatched rectangle arrays");
        Diffn {
            x,
            y,
            dx,
            dy,
            size,
            delayed_demon: None,
            to_propagate: HashSet::new(),
            neighbors: Vec::new(),
        }
    }

    fn disjoint_horizontal(&self, state: &State, i: usize, j: usize) -> bool {
        state.min(self.x[i]) >= state.max(self.x[j]) + state.max(self.dx[j])
            || state.min(self.x[j]) >= state.max(self.x[i]) + state.max(self.dx[i])
    }

    fn disjoint_vertical(&self, state: &State, i: usize, j: usize) -> bool {
        state.min(self.y[i]) >= state.max(self.y[j]) + state.max(self.dy[j])
            || state.min(self.y[j]) >= state.max(self.y[i]) + state.max(self.dy[i])
    }

    fn overlap(&self, state: &State, i: usize, j: usize) -> bool {
        !self.disjoint_horizontal(state, i, j) && !self.disjoint_vertical(state, i, j)
    }

    /// Collects all boxes whose potential placement overlaps `box_index`.
    fn fill_neighbors(&mut self, state: &State, box_index: usize) {
        self.neighbors.clear();
        for other in 0..self.size {
            if other != box_index && self.overlap(state, other, box_index) {
                self.neighbors.push(other);
            }
        }
    }

    /// The minimal area of a set of boxes must fit in their bounding box.
    fn check_energy(&self, state: &State, box_index: usize) -> SolverResult<()> {
        let mut area_min_x = state.min(self.x[box_index]);
        let mut area_max_x = state.max(self.x[box_index]) + state.max(self.dx[box_index]);
        let mut area_min_y = state.min(self.y[box_index]);
        let mut area_max_y = state.max(self.y[box_index]) + state.max(self.dy[box_index]);
        let mut sum_of_areas = state.min(self.dx[box_index]) * state.min(self.dy[box_index]);
        for &other in &self.neighbors {
            area_min_x = area_min_x.min(state.min(self.x[other]));
            area_max_x = area_max_x.max(state.max(self.x[other]) + state.max(self.dx[other]));
            area_min_y = area_min_y.min(state.min(self.y[other]));
            area_max_y = area_max_y.max(state.max(self.y[other]) + state.max(self.dy[other]));
            sum_of_areas += state.min(self.dx[other]) * state.min(self.dy[other]);
            let bounding_area = (area_max_x - area_min_x) * (area_max_y - area_min_y);
            if sum_of_areas > bounding_area {
                return Err(Failure);
            }
        }
        Ok(())
    }

    fn push_overlapping_boxes(&self, state: &mut State, box_index: usize) -> SolverResult<()> {
        let start_max_x = state.max(self.x[box_index]);
        let end_min_x = state.min(self.x[box_index]) + state.min(self.dx[box_index]);
        let start_max_y = state.max(self.y[box_index]);
        let end_min_y = state.min(self.y[box_index]) + state.min(self.dy[box_index]);
        // Nothing to push without a mandatory part.
        if start_max_x < end_min_x && start_max_y < end_min_y {
            for i in 0..self.neighbors.len() {
                let other = self.neighbors[i];
                self.push_one_box(state, box_index, other, start_max_x, end_min_x, start_max_y, end_min_y)?;
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn push_one_box(
        &self,
        state: &mut State,
        box_index: usize,
        other: usize,
        start_max_box_x: IntCst,
        end_min_box_x: IntCst,
        start_max_box_y: IntCst,
        end_min_box_y: IntCst,
    ) -> SolverResult<()> {
        let start_max_other_x = state.max(self.x[other]);
        let end_min_other_x = state.min(self.x[other]) + state.min(self.dx[other]);
        let start_max_other_y = state.max(self.y[other]);
        let end_min_other_y = state.min(self.y[other]) + state.min(self.dy[other]);
        // Both mandatory parts must be non-empty.
        if start_max_other_x < end_min_other_x && start_max_other_y < end_min_other_y {
            let overlap_horizontal = start_max_other_x < end_min_box_x && start_max_box_x < end_min_other_x;
            let overlap_vertical = start_max_other_y < end_min_box_y && start_max_box_y < end_min_other_y;
            if overlap_horizontal && overlap_vertical {
                return Err(Failure);
            } else if overlap_horizontal {
                self.push_one_direction(
                    state,
                    box_index,
                    other,
                    start_max_box_y,
                    end_min_box_y,
                    start_max_other_y,
                    end_min_other_y,
                    false,
                )?;
            } else if overlap_vertical {
                self.push_one_direction(
                    state,
                    box_index,
                    other,
                    start_max_box_x,
                    end_min_box_x,
                    start_max_other_x,
                    end_min_other_x,
                    true,
                )?;
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn push_one_direction(
        &self,
        state: &mut State,
        box_index: usize,
        other: usize,
        start_max_box: IntCst,
        end_min_box: IntCst,
        start_max_other: IntCst,
        end_min_other: IntCst,
        horizontal: bool,
    ) -> SolverResult<()> {
        let (positions, sizes) = if horizontal {
            (&self.x, &self.dx)
        } else {
            (&self.y, &self.dy)
        };
        if end_min_other > start_max_box {
            // Other is forced after box.
            state.set_min(positions[other], end_min_box)?;
            state.set_max(positions[box_index], start_max_other - state.min(sizes[box_index]))?;
            state.set_max(sizes[box_index], start_max_other - state.min(positions[box_index]))?;
        } else if end_min_box > start_max_other {
            // Box is forced after other.
            state.set_min(positions[box_index], end_min_other)?;
            state.set_max(positions[other], start_max_box - state.min(sizes[other]))?;
            state.set_max(sizes[other], start_max_box - state.min(positions[other]))?;
        }
        Ok(())
    }

    fn propagate_all(&mut self, state: &mut State) -> SolverResult<()> {
        let dirty = self.to_propagate.iter().copied().sorted_unstable().collect_vec();
        for box_index in dirty {
            self.fill_neighbors(state, box_index);
            self.check_energy(state, box_index)?;
            self.push_overlapping_boxes(state, box_index)?;
        }
        self.to_propagate.clear();
        Ok(())
    }
}

impl Constraint for Diffn {
    fn name(&self) -> String {
        format!("Diffn({} boxes)", self.size)
    }

    fn post(&mut self, ctx: &mut PostCtx) {
        for i in 0..self.size {
            let d = ctx.demon(i as u32, DemonPriority::Normal);
            ctx.state.when_range(self.x[i], d);
            ctx.state.when_range(self.y[i], d);
            ctx.state.when_range(self.dx[i], d);
            ctx.state.when_range(self.dy[i], d);
        }
        self.delayed_demon = Some(ctx.demon(PROPAGATE_ALL_TAG, DemonPriority::Delayed));

        let all_sizes_bound = self
            .dx
            .iter()
            .chain(self.dy.iter())
            .all(|&v| ctx.state.bound(v));
        let positions_non_negative = self
            .x
            .iter()
            .chain(self.y.iter())
            .all(|&v| ctx.state.min(v) >= 0 && ctx.state.max(v) < INT_CST_MAX);
        if all_sizes_bound && positions_non_negative {
            // Redundant cumulative constraints, one per axis.
            let min_x = self.x.iter().map(|&v| ctx.state.min(v)).min().unwrap();
            let max_x = self.x.iter().map(|&v| ctx.state.max(v)).max().unwrap();
            let max_size_x = self.dx.iter().map(|&v| ctx.state.max(v)).max().unwrap();
            let min_y = self.y.iter().map(|&v| ctx.state.min(v)).min().unwrap();
            let max_y = self.y.iter().map(|&v| ctx.state.max(v)).max().unwrap();
            let max_size_y = self.dy.iter().map(|&v| ctx.state.max(v)).max().unwrap();
            let size_x: Vec<IntCst> = self.dx.iter().map(|&v| ctx.state.value(v)).collect();
            let size_y: Vec<IntCst> = self.dy.iter().map(|&v| ctx.state.value(v)).collect();

            add_cumulative(ctx, &self.x, &size_x, &size_y, max_size_y + max_y - min_y);
            add_cumulative(ctx, &self.y, &size_y, &size_x, max_size_x + max_x - min_x);
        }
    }

    fn initial_propagate(&mut self, state: &mut State) -> SolverResult<()> {
        // All sizes should be > 0.
        for i in 0..self.size {
            state.set_min(self.dx[i], 1)?;
            state.set_min(self.dy[i], 1)?;
        }
        self.to_propagate.extend(0..self.size);
        self.propagate_all(state)
    }

    fn run(&mut self, state: &mut State, tag: u32) -> SolverResult<()> {
        if tag == PROPAGATE_ALL_TAG {
            self.propagate_all(state)
        } else {
            self.to_propagate.insert(tag as usize);
            state.enqueue_demon(self.delayed_demon.expect("constraint not posted"));
            Ok(())
        }
    }
}

fn add_cumulative(ctx: &mut PostCtx, positions: &[VarRef], sizes: &[IntCst], demands: &[IntCst], capacity: IntCst) {
    let intervals = positions
        .iter()
        .zip(sizes.iter())
        .enumerate()
        .map(|(i, (&p, &s))| ctx.state.new_start_var_interval(p, s, format!("interval{i}")))
        .collect_vec();
    ctx.add_constraint(Box::new(Cumulative::new(
        intervals,
        demands.to_vec(),
        capacity,
        "cumul",
    )));
}
