//! Cross-module properties: queue ordering, demon deduplication, safe-sum
//! agreement and boolean aggregator fixpoints.

use libra::constraints::{Constraint, PostCtx};
use libra::core::state::{DemonPriority, State};
use libra::core::{DemonId, SolverResult, VarRef};
use libra::Solver;
use std::cell::RefCell;
use std::rc::Rc;

/// Records the tags of its executed demons.
struct Probe {
    vars: Vec<VarRef>,
    priority: DemonPriority,
    log: Rc<RefCell<Vec<u32>>>,
}

impl Constraint for Probe {
    fn name(&self) -> String {
        "Probe".to_string()
    }

    fn post(&mut self, ctx: &mut PostCtx) {
        for (tag, &v) in self.vars.iter().enumerate() {
            let d = ctx.demon(tag as u32, self.priority);
            ctx.state.when_range(v, d);
        }
    }

    fn initial_propagate(&mut self, _state: &mut State) -> SolverResult<()> {
        Ok(())
    }

    fn run(&mut self, _state: &mut State, tag: u32) -> SolverResult<()> {
        self.log.borrow_mut().push(tag);
        Ok(())
    }
}

/// Delayed demons registered on the same event execute in FIFO
/// registration order.
#[test]
fn queue_fifo_order() {
    let mut s = Solver::new();
    let v = s.new_int_var(0, 10, "v");
    let log = Rc::new(RefCell::new(Vec::new()));
    s.add_constraint(Box::new(Probe {
        vars: vec![v, v, v],
        priority: DemonPriority::Delayed,
        log: log.clone(),
    }))
    .unwrap();

    s.state.set_min(v, 1).unwrap();
    s.propagate().unwrap();
    assert_eq!(*log.borrow(), vec![0, 1, 2]);
}

/// Normal demons run before any delayed demon.
#[test]
fn normal_drains_before_delayed() {
    let mut s = Solver::new();
    let v = s.new_int_var(0, 10, "v");
    let log = Rc::new(RefCell::new(Vec::new()));
    s.add_constraint(Box::new(Probe {
        vars: vec![v],
        priority: DemonPriority::Delayed,
        log: log.clone(),
    }))
    .unwrap();
    s.add_constraint(Box::new(Probe {
        vars: vec![v, v],
        priority: DemonPriority::Normal,
        log: log.clone(),
    }))
    .unwrap();

    s.state.set_min(v, 1).unwrap();
    s.propagate().unwrap();
    // Normal demons (tags 0 and 1 of the second probe) fire during the
    // variable's own process step; the delayed one (tag 0 of the first)
    // fires last.
    assert_eq!(*log.borrow(), vec![0, 1, 0]);
}

/// A demon attached to two events is enqueued once per drain.
struct SharedDemon {
    vars: Vec<VarRef>,
    log: Rc<RefCell<Vec<u32>>>,
}

impl Constraint for SharedDemon {
    fn name(&self) -> String {
        "SharedDemon".to_string()
    }

    fn post(&mut self, ctx: &mut PostCtx) {
        let d = ctx.demon(7, DemonPriority::Delayed);
        for &v in &self.vars {
            ctx.state.when_range(v, d);
        }
    }

    fn initial_propagate(&mut self, _state: &mut State) -> SolverResult<()> {
        Ok(())
    }

    fn run(&mut self, _state: &mut State, tag: u32) -> SolverResult<()> {
        self.log.borrow_mut().push(tag);
        Ok(())
    }
}

#[test]
fn queued_demon_is_not_duplicated() {
    let mut s = Solver::new();
    let a = s.new_int_var(0, 10, "a");
    let b = s.new_int_var(0, 10, "b");
    let log = Rc::new(RefCell::new(Vec::new()));
    s.add_constraint(Box::new(SharedDemon {
        vars: vec![a, b],
        log: log.clone(),
    }))
    .unwrap();

    // Both events fire in the same batch; the demon runs once.
    s.freeze_queue();
    s.state.set_min(a, 1).unwrap();
    s.state.set_min(b, 1).unwrap();
    s.unfreeze_queue().unwrap();
    assert_eq!(log.borrow().len(), 1);

    // A later event re-triggers it.
    s.state.set_min(a, 2).unwrap();
    s.propagate().unwrap();
    assert_eq!(log.borrow().len(), 2);
}

/// A demon may re-enqueue itself while it is running; it is executed
/// again, once.
struct SelfRequeue {
    var: VarRef,
    demon: Option<DemonId>,
    runs: Rc<RefCell<u32>>,
}

impl Constraint for SelfRequeue {
    fn name(&self) -> String {
        "SelfRequeue".to_string()
    }

    fn post(&mut self, ctx: &mut PostCtx) {
        let d = ctx.demon(0, DemonPriority::Delayed);
        ctx.state.when_range(self.var, d);
        self.demon = Some(d);
    }

    fn initial_propagate(&mut self, _state: &mut State) -> SolverResult<()> {
        Ok(())
    }

    fn run(&mut self, state: &mut State, _tag: u32) -> SolverResult<()> {
        *self.runs.borrow_mut() += 1;
        if *self.runs.borrow() < 3 {
            state.enqueue_demon(self.demon.unwrap());
        }
        Ok(())
    }
}

#[test]
fn self_requeueing_demon_terminates() {
    let mut s = Solver::new();
    let v = s.new_int_var(0, 10, "v");
    let runs = Rc::new(RefCell::new(0));
    s.add_constraint(Box::new(SelfRequeue {
        var: v,
        demon: None,
        runs: runs.clone(),
    }))
    .unwrap();

    s.state.set_min(v, 1).unwrap();
    s.propagate().unwrap();
    assert_eq!(*runs.borrow(), 3);
}

/// The safe sum agrees with the plain sum whenever no overflow can occur.
#[test]
fn safe_sum_agrees_with_sum() {
    use libra::constraints::sum::{SafeSumConstraint, SumConstraint};

    let cases: &[(&[(i64, i64)], (i64, i64))] = &[
        (&[(0, 10), (0, 10), (0, 10)], (15, 15)),
        (&[(2, 5), (1, 9), (0, 3)], (4, 7)),
        (&[(0, 4), (0, 4), (0, 4)], (12, 12)),
        (&[(-5, 5), (-5, 5), (-5, 5)], (-15, -15)),
        (&[(1, 2), (1, 2), (1, 2)], (0, 0)), // infeasible
    ];
    for &(domains, (t_min, t_max)) in cases {
        let run = |safe: bool| -> Result<Vec<(i64, i64)>, libra::Failure> {
            let mut s = Solver::new();
            let vars: Vec<_> = domains
                .iter()
                .enumerate()
                .map(|(i, &(lo, hi))| s.new_int_var(lo, hi, format!("v{i}")))
                .collect();
            let t = s.new_int_var(t_min, t_max, "t");
            if safe {
                s.add_constraint(Box::new(SafeSumConstraint::new(vars.clone(), t, 64)))?;
            } else {
                s.add_constraint(Box::new(SumConstraint::new(vars.clone(), t, 64)))?;
            }
            Ok(vars.iter().map(|&v| (s.state.min(v), s.state.max(v))).collect())
        };
        assert_eq!(run(false), run(true), "sum variants disagree on {domains:?}");
    }
}

/// BoolAnd fixpoint: all inputs at 1 force the target to 1; any input at
/// 0 forces it to 0. Symmetric for BoolOr.
#[test]
fn boolean_aggregator_fixpoints() {
    // AND, all ones.
    let mut s = Solver::new();
    let bools: Vec<_> = (0..3).map(|i| s.new_bool_var(format!("b{i}"))).collect();
    let t = s.make_min(&bools).unwrap();
    for &b in &bools {
        s.state.set_value(b, 1).unwrap();
        s.propagate().unwrap();
    }
    assert_eq!(s.state.min(t), 1);

    // AND, one zero.
    let mut s = Solver::new();
    let bools: Vec<_> = (0..3).map(|i| s.new_bool_var(format!("b{i}"))).collect();
    let t = s.make_min(&bools).unwrap();
    s.state.set_value(bools[1], 0).unwrap();
    s.propagate().unwrap();
    assert_eq!(s.state.max(t), 0);

    // OR, all zeros.
    let mut s = Solver::new();
    let bools: Vec<_> = (0..3).map(|i| s.new_bool_var(format!("b{i}"))).collect();
    let t = s.make_max(&bools).unwrap();
    for &b in &bools {
        s.state.set_value(b, 0).unwrap();
        s.propagate().unwrap();
    }
    assert_eq!(s.state.max(t), 0);

    // OR, one one.
    let mut s = Solver::new();
    let bools: Vec<_> = (0..3).map(|i| s.new_bool_var(format!("b{i}"))).collect();
    let t = s.make_max(&bools).unwrap();
    s.state.set_value(bools[2], 1).unwrap();
    s.propagate().unwrap();
    assert_eq!(s.state.min(t), 1);
}

/// Boolean cardinality and scalar-product constraints.
#[test]
fn boolean_cardinality_and_scal_prod() {
    // sum <= 1: first one forces the others to zero.
    let mut s = Solver::new();
    let bools: Vec<_> = (0..4).map(|i| s.new_bool_var(format!("b{i}"))).collect();
    s.make_sum_less_or_equal(&bools, 1).unwrap();
    s.state.set_value(bools[0], 1).unwrap();
    s.propagate().unwrap();
    for &b in &bools[1..] {
        assert_eq!(s.state.max(b), 0);
    }

    // sum == var tracks the counters in both directions.
    let mut s = Solver::new();
    let bools: Vec<_> = (0..4).map(|i| s.new_bool_var(format!("b{i}"))).collect();
    let t = s.make_sum(&bools).unwrap();
    s.state.set_value(bools[0], 1).unwrap();
    s.state.set_value(bools[1], 0).unwrap();
    s.propagate().unwrap();
    assert_eq!((s.state.min(t), s.state.max(t)), (1, 3));
    s.state.set_value(t, 3).unwrap();
    s.propagate().unwrap();
    assert_eq!(s.state.min(bools[2]), 1);
    assert_eq!(s.state.min(bools[3]), 1);

    // Scalar product: slack walk fixes expensive items first.
    let mut s = Solver::new();
    let bools: Vec<_> = (0..3).map(|i| s.new_bool_var(format!("b{i}"))).collect();
    let t = s.make_scal_prod(&bools, &[2, 3, 10]).unwrap();
    assert_eq!((s.state.min(t), s.state.max(t)), (0, 15));
    s.state.set_max(t, 6).unwrap();
    s.propagate().unwrap();
    // 10 exceeds the upward slack: its variable is forced to 0.
    assert_eq!(s.state.max(bools[2]), 0);

    let mut s = Solver::new();
    let bools: Vec<_> = (0..3).map(|i| s.new_bool_var(format!("b{i}"))).collect();
    s.make_scal_prod_equality_cst(&bools, &[2, 3, 10], 12).unwrap();
    // Only 2 + 10 can reach 12: b2 is forced in, b1 out.
    assert_eq!(s.state.min(bools[2]), 1);
    assert_eq!(s.state.max(bools[1]), 0);
    assert_eq!(s.state.min(bools[0]), 1);
}
