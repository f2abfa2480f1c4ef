//! Time-table cumulative constraint.
//!
//! Tasks are interval variables with a fixed demand; at any time point the
//! demands of the tasks that must overlap it may not exceed the capacity.
//! Propagation builds the profile of mandatory parts, fails on overload,
//! and pushes the start of tasks through profile sections they cannot fit
//! over. Sound but deliberately light: it is used as a redundant filter.

use crate::constraints::{Constraint, PostCtx};
use crate::core::state::{DemonPriority, State};
use crate::core::{DemonId, Failure, IntCst, IntervalId, SolverResult};
use itertools::Itertools;

const PROPAGATE_TAG: u32 = u32::MAX;

pub struct Cumulative {
    intervals: Vec<IntervalId>,
    demands: Vec<IntCst>,
    capacity: IntCst,
    name: String,
    propagate_demon: Option<DemonId>,
}

/// Mandatory part of a task: `[start, end)` with its demand.
struct Section {
    start: IntCst,
    end: IntCst,
    demand: IntCst,
    task: usize,
}

impl Cumulative {
    pub fn new(intervals: Vec<IntervalId>, demands: Vec<IntCst>, capacity: IntCst, name: impl Into<String>) -> Self {
        assert_eq!(intervals.len(), demands.len(), "one demand per interval is required");
        assert!(capacity >= 0);
        Cumulative {
            intervals,
            demands,
            capacity,
            name: name.into(),
            propagate_demon: None,
        }
    }

    fn mandatory_parts(&self, state: &State) -> Vec<Section> {
        let mut sections = Vec::new();
        for (t, &i) in self.intervals.iter().enumerate() {
            if !state.must_be_performed(i) {
                continue;
            }
            let start_max = state.start_max(i);
            let end_min = state.end_min(i);
            if start_max < end_min {
                sections.push(Section {
                    start: start_max,
                    end: end_min,
                    demand: self.demands[t],
                    task: t,
                });
            }
        }
        sections
    }

    fn propagate(&self, state: &mut State) -> SolverResult<()> {
        let sections = self.mandatory_parts(state);

        // Overload check on the profile of mandatory parts.
        let mut events: Vec<(IntCst, IntCst)> = Vec::with_capacity(2 * sections.len());
        for s in &sections {
            events.push((s.start, s.demand));
            events.push((s.end, -s.demand));
        }
        events.sort_unstable();
        let mut height = 0;
        for &(_, delta) in &events {
            height += delta;
            if height > self.capacity {
                return Err(Failure);
            }
        }

        // Push the start of each task through sections it cannot share.
        for (t, &interval) in self.intervals.iter().enumerate() {
            if !state.may_be_performed(interval) {
                continue;
            }
            let demand = self.demands[t];
            let duration = state.duration_min(interval);
            let mut est = state.start_min(interval);
            let mut moved = true;
            while moved {
                moved = false;
                for s in sections.iter().sorted_by_key(|s| s.start) {
                    if s.task == t {
                        continue;
                    }
                    let overlaps = s.start < est + duration && est < s.end;
                    if overlaps && s.demand + demand > self.capacity {
                        est = s.end;
                        moved = true;
                    }
                }
            }
            if est > state.start_min(interval) {
                state.set_start_min(interval, est)?;
            }
        }
        Ok(())
    }
}

impl Constraint for Cumulative {
    fn name(&self) -> String {
        format!("Cumulative({}, {} tasks)", self.name, self.intervals.len())
    }

    fn post(&mut self, ctx: &mut PostCtx) {
        let propagate_demon = ctx.demon(PROPAGATE_TAG, DemonPriority::Delayed);
        self.propagate_demon = Some(propagate_demon);
        for (t, &i) in self.intervals.iter().enumerate() {
            let d = ctx.demon(t as u32, DemonPriority::Normal);
            ctx.state.when_anything(i, d);
        }
    }

    fn initial_propagate(&mut self, state: &mut State) -> SolverResult<()> {
        self.propagate(state)
    }

    fn run(&mut self, state: &mut State, tag: u32) -> SolverResult<()> {
        if tag == PROPAGATE_TAG {
            self.propagate(state)
        } else {
            // Leaf change: defer the actual work to the single delayed pass.
            state.enqueue_demon(self.propagate_demon.expect("constraint not posted"));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::state::State;

    fn propagate(c: &Cumulative, state: &mut State) -> SolverResult<()> {
        c.propagate(state)
    }

    #[test]
    fn test_overload_fails() {
        let mut s = State::new();
        // Two tasks with mandatory overlap at t in [2, 3).
        let a = s.new_fixed_duration_interval(0, 2, 3, false, "a");
        let b = s.new_fixed_duration_interval(2, 2, 3, false, "b");
        let c = Cumulative::new(vec![a, b], vec![1, 1], 1, "cumul");
        assert_eq!(propagate(&c, &mut s), Err(Failure));
    }

    #[test]
    fn test_push_past_profile() {
        let mut s = State::new();
        // Task a is fixed on [0, 4) and saturates the resource.
        let a = s.new_fixed_duration_interval(0, 0, 4, false, "a");
        let b = s.new_fixed_duration_interval(0, 10, 2, false, "b");
        let c = Cumulative::new(vec![a, b], vec![1, 1], 1, "cumul");
        propagate(&c, &mut s).unwrap();
        assert_eq!(s.start_min(b), 4);
    }
}
