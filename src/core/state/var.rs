use crate::core::state::event::UndoEvent;
use crate::core::state::queue::Entity;
use crate::core::state::State;
use crate::core::{DemonId, Failure, IntCst, SolverResult, VarRef};
use smallvec::SmallVec;

pub(crate) type DemonList = SmallVec<[DemonId; 4]>;

/// Storage of an integer variable: reversible bounds, the lazy previous
/// bounds (state at the last run of this variable's demons), the postponed
/// bounds (only meaningful while the variable is in process) and the
/// demons attached to each event.
pub(crate) struct IntVarData {
    pub min: IntCst,
    pub max: IntCst,
    pub previous_min: IntCst,
    pub previous_max: IntCst,
    pub postponed_min: IntCst,
    pub postponed_max: IntCst,
    pub in_process: bool,
    pub enqueued: bool,
    pub name: String,
    range_demons: DemonList,
    bound_demons: DemonList,
    domain_demons: DemonList,
}

impl IntVarData {
    pub fn new(min: IntCst, max: IntCst, name: String) -> Self {
        IntVarData {
            min,
            max,
            previous_min: min,
            previous_max: max,
            postponed_min: min,
            postponed_max: max,
            in_process: false,
            enqueued: false,
            name,
            range_demons: SmallVec::new(),
            bound_demons: SmallVec::new(),
            domain_demons: SmallVec::new(),
        }
    }

    /// Corrects the previous bounds so that they contain the current ones.
    ///
    /// Modifications going down the search tree are monotonic, so the
    /// previous bounds written at the end of the last process step remain
    /// valid and this is a no-op. After a backtrack they may lie strictly
    /// inside the current domain, which this check repairs.
    fn sync_previous(&mut self) {
        if self.previous_min > self.min {
            self.previous_min = self.min;
        }
        if self.previous_max < self.max {
            self.previous_max = self.max;
        }
    }
}

/// Demons that a process step must dispatch: `run` is executed in place,
/// `delay` goes to the delayed queue.
pub(crate) struct FiredDemons {
    pub run: Vec<DemonId>,
    pub delay: Vec<DemonId>,
}

impl State {
    pub fn new_var(&mut self, min: IntCst, max: IntCst, name: impl Into<String>) -> VarRef {
        assert!(min <= max, "Empty initial domain [{min}, {max}]");
        self.vars.push(IntVarData::new(min, max, name.into()))
    }

    pub fn min(&self, v: VarRef) -> IntCst {
        self.vars[v].min
    }

    pub fn max(&self, v: VarRef) -> IntCst {
        self.vars[v].max
    }

    pub fn bound(&self, v: VarRef) -> bool {
        let d = &self.vars[v];
        d.min == d.max
    }

    /// Value of a bound variable.
    ///
    /// # Panics
    /// Panics if the variable is not bound.
    pub fn value(&self, v: VarRef) -> IntCst {
        let d = &self.vars[v];
        assert!(d.min == d.max, "Value() called on the unbound variable {:?}", v);
        d.min
    }

    pub fn contains(&self, v: VarRef, value: IntCst) -> bool {
        let d = &self.vars[v];
        d.min <= value && value <= d.max
    }

    /// Lower bound at the start of the current propagation step of `v`.
    pub fn old_min(&self, v: VarRef) -> IntCst {
        self.vars[v].previous_min
    }

    /// Upper bound at the start of the current propagation step of `v`.
    pub fn old_max(&self, v: VarRef) -> IntCst {
        self.vars[v].previous_max
    }

    pub fn var_name(&self, v: VarRef) -> &str {
        &self.vars[v].name
    }

    pub fn variables(&self) -> impl Iterator<Item = VarRef> {
        self.vars.keys()
    }

    pub fn set_min(&mut self, v: VarRef, m: IntCst) -> SolverResult<bool> {
        let d = &mut self.vars[v];
        if d.in_process {
            if m > d.postponed_max {
                return Err(Failure);
            }
            if m > d.postponed_min {
                d.postponed_min = m;
                return Ok(true);
            }
            Ok(false)
        } else if m <= d.min {
            Ok(false)
        } else if m > d.max {
            Err(Failure)
        } else {
            d.sync_previous();
            let prev = d.min;
            d.min = m;
            self.trail.push(UndoEvent::VarMin { var: v, prev });
            self.enqueue_var_handler(v);
            Ok(true)
        }
    }

    pub fn set_max(&mut self, v: VarRef, m: IntCst) -> SolverResult<bool> {
        let d = &mut self.vars[v];
        if d.in_process {
            if m < d.postponed_min {
                return Err(Failure);
            }
            if m < d.postponed_max {
                d.postponed_max = m;
                return Ok(true);
            }
            Ok(false)
        } else if m >= d.max {
            Ok(false)
        } else if m < d.min {
            Err(Failure)
        } else {
            d.sync_previous();
            let prev = d.max;
            d.max = m;
            self.trail.push(UndoEvent::VarMax { var: v, prev });
            self.enqueue_var_handler(v);
            Ok(true)
        }
    }

    pub fn set_range(&mut self, v: VarRef, mi: IntCst, ma: IntCst) -> SolverResult<bool> {
        let d = &mut self.vars[v];
        if d.in_process {
            if mi > d.postponed_max || ma < d.postponed_min {
                return Err(Failure);
            }
            let mut updated = false;
            if mi > d.postponed_min {
                d.postponed_min = mi;
                updated = true;
            }
            if ma < d.postponed_max {
                d.postponed_max = ma;
                updated = true;
            }
            Ok(updated)
        } else {
            if mi > d.max || ma < d.min {
                return Err(Failure);
            }
            if mi <= d.min && ma >= d.max {
                return Ok(false);
            }
            d.sync_previous();
            if mi > d.min {
                let prev = d.min;
                d.min = mi;
                self.trail.push(UndoEvent::VarMin { var: v, prev });
            }
            let d = &mut self.vars[v];
            if ma < d.max {
                let prev = d.max;
                d.max = ma;
                self.trail.push(UndoEvent::VarMax { var: v, prev });
            }
            self.enqueue_var_handler(v);
            Ok(true)
        }
    }

    pub fn set_value(&mut self, v: VarRef, value: IntCst) -> SolverResult<bool> {
        self.set_range(v, value, value)
    }

    /// Removes `value` from the domain. With bounds-only domains, interior
    /// values are not representable as holes and the call is a no-op.
    pub fn remove_value(&mut self, v: VarRef, value: IntCst) -> SolverResult<bool> {
        let d = &self.vars[v];
        if value == d.min && value == d.max {
            Err(Failure)
        } else if value == d.min {
            self.set_min(v, value + 1)
        } else if value == d.max {
            self.set_max(v, value - 1)
        } else {
            Ok(false)
        }
    }

    /// Attaches a demon to any bound modification of `v`.
    pub fn when_range(&mut self, v: VarRef, d: DemonId) {
        if !self.bound(v) {
            self.vars[v].range_demons.push(d);
        }
    }

    /// Attaches a demon to the event "`v` became bound".
    pub fn when_bound(&mut self, v: VarRef, d: DemonId) {
        if !self.bound(v) {
            self.vars[v].bound_demons.push(d);
        }
    }

    /// Attaches a demon to any domain modification of `v`.
    pub fn when_domain(&mut self, v: VarRef, d: DemonId) {
        if !self.bound(v) {
            self.vars[v].domain_demons.push(d);
        }
    }

    fn enqueue_var_handler(&mut self, v: VarRef) {
        let d = &mut self.vars[v];
        if !d.enqueued {
            d.enqueued = true;
            self.queue.push_handler(Entity::Var(v));
        }
    }

    /// Enters the process step of `v`: snapshots the postponed bounds and
    /// collects the demons to dispatch based on which events fired since
    /// the previous step.
    pub(crate) fn begin_var_process(&mut self, v: VarRef) -> FiredDemons {
        let d = &mut self.vars[v];
        debug_assert!(!d.in_process, "variable processed reentrantly");
        d.in_process = true;
        d.enqueued = false;
        d.postponed_min = d.min;
        d.postponed_max = d.max;
        let changed = d.min != d.previous_min || d.max != d.previous_max;
        let now_bound = d.min == d.max;

        let mut fired: Vec<DemonId> = Vec::new();
        if now_bound {
            fired.extend_from_slice(&d.bound_demons);
        }
        if changed {
            fired.extend_from_slice(&d.range_demons);
            fired.extend_from_slice(&d.domain_demons);
        }
        self.queue.set_in_process(Entity::Var(v));
        self.split_by_priority(fired)
    }

    /// Leaves the process step of `v`: records the previous bounds and
    /// applies any postponed tightening through the regular setters (which
    /// re-enqueue the handler).
    pub(crate) fn end_var_process(&mut self, v: VarRef) -> SolverResult<()> {
        let d = &mut self.vars[v];
        d.in_process = false;
        d.previous_min = d.min;
        d.previous_max = d.max;
        let (pmin, pmax) = (d.postponed_min, d.postponed_max);
        let tighter = pmin > d.min || pmax < d.max;
        self.queue.clear_in_process();
        if tighter {
            self.set_range(v, pmin, pmax)?;
        }
        Ok(())
    }

    pub(crate) fn split_by_priority(&self, demons: Vec<DemonId>) -> FiredDemons {
        let mut run = Vec::new();
        let mut delay = Vec::new();
        for d in demons {
            if self.demon_is_delayed(d) {
                delay.push(d);
            } else {
                run.push(d);
            }
        }
        FiredDemons { run, delay }
    }
}

#[cfg(test)]
mod tests {
    use crate::backtrack::Backtrack;
    use crate::core::state::State;
    use crate::core::Failure;

    #[test]
    fn test_setters() {
        let mut s = State::new();
        let v = s.new_var(0, 10, "v");
        assert_eq!(s.set_min(v, 0), Ok(false));
        assert_eq!(s.set_min(v, 2), Ok(true));
        assert_eq!(s.set_max(v, 8), Ok(true));
        assert_eq!((s.min(v), s.max(v)), (2, 8));
        assert!(!s.bound(v));
        assert_eq!(s.set_min(v, 9), Err(Failure));
        assert_eq!(s.set_value(v, 5), Ok(true));
        assert!(s.bound(v));
        assert_eq!(s.value(v), 5);
    }

    #[test]
    fn test_remove_value_edges_only() {
        let mut s = State::new();
        let v = s.new_var(0, 10, "v");
        assert_eq!(s.remove_value(v, 0), Ok(true));
        assert_eq!(s.min(v), 1);
        assert_eq!(s.remove_value(v, 10), Ok(true));
        assert_eq!(s.max(v), 9);
        // interior removal is not representable: no-op
        assert_eq!(s.remove_value(v, 5), Ok(false));
        assert!(s.contains(v, 5));
    }

    #[test]
    fn test_backtrack_restores_bounds() {
        let mut s = State::new();
        let v = s.new_var(0, 10, "v");
        let lvl = s.save_state();
        s.set_range(v, 3, 7).unwrap();
        s.save_state();
        s.set_value(v, 4).unwrap();
        assert_eq!((s.min(v), s.max(v)), (4, 4));
        s.restore_last();
        assert_eq!((s.min(v), s.max(v)), (3, 7));
        s.restore(lvl);
        assert_eq!((s.min(v), s.max(v)), (0, 10));
    }
}
