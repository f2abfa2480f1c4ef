//! End-to-end scenarios exercising the whole engine through the public
//! factories.

use libra::assignment::Assignment;
use libra::backtrack::Backtrack;
use libra::{Failure, Solver, INT_CST_MAX, INT_CST_MIN};

/// Sum with an integer equality: pushing the target prunes the terms.
#[test]
fn sum_with_integer_equality() {
    let mut s = Solver::new();
    let v1 = s.new_int_var(0, 10, "v1");
    let v2 = s.new_int_var(0, 10, "v2");
    let v3 = s.new_int_var(0, 10, "v3");
    let t = s.make_sum(&[v1, v2, v3]).unwrap();
    s.make_equality_cst(t, 15).unwrap();

    assert_eq!(s.state.min(v1), 0);
    assert_eq!(s.state.max(v1), 10);

    s.state.set_value(v1, 8).unwrap();
    s.propagate().unwrap();
    assert_eq!(s.state.max(v2), 7);
    assert_eq!(s.state.max(v3), 7);
    assert_eq!(s.state.min(t), 15);
    assert_eq!(s.state.max(t), 15);
}

/// BoolOr with a single surviving candidate gets forced to 1.
#[test]
fn bool_or_single_candidate() {
    let mut s = Solver::new();
    let bools: Vec<_> = (0..4).map(|i| s.new_bool_var(format!("b{i}"))).collect();
    let t = s.make_max(&bools).unwrap();
    s.make_equality_cst(t, 1).unwrap();

    for &b in &bools[..3] {
        s.state.set_value(b, 0).unwrap();
        s.propagate().unwrap();
    }
    assert_eq!(s.state.min(bools[3]), 1);
}

/// Interval coherence: `start + duration = end` tightens all three
/// storages on construction and stays consistent at the fixpoint.
#[test]
fn interval_coherence() {
    let mut s = Solver::new();
    let i = s.make_interval_var(0, 10, 3, 5, 0, 12, false, "i");
    assert_eq!((s.state.start_min(i), s.state.start_max(i)), (0, 9));
    assert_eq!((s.state.duration_min(i), s.state.duration_max(i)), (3, 5));
    assert_eq!((s.state.end_min(i), s.state.end_max(i)), (3, 12));
    // Fixpoint coherence.
    assert!(s.state.start_min(i) + s.state.duration_min(i) <= s.state.end_min(i));
    assert!(s.state.start_max(i) + s.state.duration_max(i) >= s.state.end_max(i));

    // Tightening the end pulls the start along.
    s.state.set_end_max(i, 8).unwrap();
    s.propagate().unwrap();
    assert_eq!(s.state.start_max(i), 5);
}

/// An unperformed optional interval ignores bound setters instead of
/// failing.
#[test]
fn unperformed_interval_never_fails() {
    let mut s = Solver::new();
    let i = s.make_interval_var(0, 10, 3, 5, 0, 12, true, "opt");
    s.state.set_performed(i, false).unwrap();
    s.propagate().unwrap();
    assert_eq!(s.state.set_start_min(i, 100), Ok(()));
    assert_eq!(s.state.set_duration_max(i, -1), Ok(()));
    assert_eq!(s.state.set_end_min(i, 50), Ok(()));
}

/// Non-overlap of two 3x3 squares: placements overlapping the fixed
/// square are rejected, placements beside it are accepted.
#[test]
fn non_overlap_of_two_squares() {
    fn squares(fix_second_at: Option<(i64, i64)>) -> Result<(), Failure> {
        let mut s = Solver::new();
        let x: Vec<_> = (0..2).map(|i| s.new_int_var(0, 4, format!("x{i}"))).collect();
        let y: Vec<_> = (0..2).map(|i| s.new_int_var(0, 4, format!("y{i}"))).collect();
        let dx: Vec<_> = (0..2).map(|i| s.new_int_var(3, 3, format!("dx{i}"))).collect();
        let dy: Vec<_> = (0..2).map(|i| s.new_int_var(3, 3, format!("dy{i}"))).collect();
        s.make_non_overlapping_rectangles(&x, &y, &dx, &dy)?;
        s.state.set_value(x[0], 1)?;
        s.state.set_value(y[0], 1)?;
        s.propagate()?;
        if let Some((x1, y1)) = fix_second_at {
            s.state.set_value(x[1], x1)?;
            s.state.set_value(y[1], y1)?;
            s.propagate()?;
        }
        Ok(())
    }

    // Any placement overlapping the mandatory part of square 0 fails.
    assert_eq!(squares(Some((2, 2))), Err(Failure));
    assert_eq!(squares(Some((1, 1))), Err(Failure));
    assert_eq!(squares(Some((0, 3))), Err(Failure));
    // Pushed past the fixed square on either axis: consistent.
    assert_eq!(squares(Some((4, 0))), Ok(()));
    assert_eq!(squares(Some((0, 4))), Ok(()));
    assert_eq!(squares(None), Ok(()));
}

/// Safe sum under saturation: neither crash nor spurious failure, and
/// the saturated root bounds are left in place.
#[test]
fn safe_sum_under_saturation() {
    let mut s = Solver::new();
    let half = INT_CST_MAX / 2;
    let v1 = s.new_int_var(INT_CST_MIN, half, "v1");
    let v2 = s.new_int_var(INT_CST_MIN, half, "v2");
    let v3 = s.new_int_var(INT_CST_MIN, half, "v3");
    let t = s.make_sum(&[v1, v2, v3]).unwrap();
    assert_eq!(s.state.min(t), INT_CST_MIN);
    assert_eq!(s.state.max(t), INT_CST_MAX);

    s.state.set_min(v1, half).unwrap();
    s.propagate().unwrap();
    // The root stays saturated and the other terms are untouched.
    assert_eq!(s.state.max(t), INT_CST_MAX);
    assert_eq!(s.state.max(v2), half);
    assert_eq!(s.state.min(v2), INT_CST_MIN);
}

/// Assignment round-trip: store, serialize, reload, restore.
#[test]
fn assignment_round_trip() {
    let mut s = Solver::new();
    let a = s.new_int_var(0, 5, "a");
    let i = s.make_interval_var(0, 10, 3, 5, 0, 12, false, "i");
    let seq = s.make_sequence(&[i], "seq");

    let mut snapshot = Assignment::new();
    snapshot.add(&s, a);
    snapshot.add_interval(&s, i);
    snapshot.add_sequence(&s, seq);
    s.state.set_range(a, 1, 4).unwrap();
    s.propagate().unwrap();
    snapshot.store(&s);

    let mut serialized = Vec::new();
    snapshot.save(&mut serialized).unwrap();

    let mut reloaded = Assignment::new();
    reloaded.add(&s, a);
    reloaded.add_interval(&s, i);
    reloaded.add_sequence(&s, seq);
    assert!(reloaded.load(serialized.as_slice()).unwrap());
    assert_eq!(snapshot, reloaded);

    // Restoring after a backtrack reapplies the stored bounds.
    let lvl = s.save_state();
    s.restore(lvl);
    assert_eq!((s.state.min(a), s.state.max(a)), (0, 5));
    reloaded.restore(&mut s).unwrap();
    assert_eq!((s.state.min(a), s.state.max(a)), (1, 4));
    assert_eq!(s.state.start_max(i), 9);

    // Element-wise equality against a fresh store of the restored state.
    let mut again = Assignment::new();
    again.add(&s, a);
    again.add_interval(&s, i);
    again.add_sequence(&s, seq);
    again.store(&s);
    assert_eq!(again.int_element(a).unwrap().min(), 1);
    assert_eq!(again.int_element(a).unwrap().max(), 4);
}
