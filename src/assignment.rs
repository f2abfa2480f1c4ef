//! Assignment snapshots.
//!
//! An assignment holds one element per registered variable: a range for an
//! integer variable, the full state for an interval variable, the ranking
//! for a sequence variable, plus an optional objective. `store` copies the
//! current domains into the elements; `restore` applies them back inside a
//! freeze/unfreeze pair so the batch propagates atomically.
//!
//! Assignments serialize to a stream of JSON-line records. Loading prefers
//! the positional fast path (names match at the same index) and falls back
//! to a name-keyed map; variables with empty or duplicate names cannot be
//! saved or loaded and are skipped with a log message.

use crate::core::state::State;
use crate::core::{IntCst, IntervalId, SequenceId, SolverResult, VarRef};
use crate::core::{INT_CST_MAX, INT_CST_MIN};
use crate::solver::Solver;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{Read, Write};

// ----- Elements -----

#[derive(Clone, Debug)]
pub struct IntVarElement {
    var: VarRef,
    name: String,
    min: IntCst,
    max: IntCst,
    activated: bool,
}

impl IntVarElement {
    fn new(var: VarRef, name: String) -> Self {
        IntVarElement {
            var,
            name,
            min: INT_CST_MIN,
            max: INT_CST_MAX,
            activated: true,
        }
    }

    pub fn var(&self) -> VarRef {
        self.var
    }

    pub fn min(&self) -> IntCst {
        self.min
    }

    pub fn max(&self) -> IntCst {
        self.max
    }

    pub fn set_range(&mut self, min: IntCst, max: IntCst) {
        self.min = min;
        self.max = max;
    }

    pub fn set_value(&mut self, value: IntCst) {
        self.set_range(value, value);
    }

    pub fn bound(&self) -> bool {
        self.min == self.max
    }

    pub fn activated(&self) -> bool {
        self.activated
    }

    pub fn activate(&mut self) {
        self.activated = true;
    }

    pub fn deactivate(&mut self) {
        self.activated = false;
    }

    fn store(&mut self, state: &State) {
        self.min = state.min(self.var);
        self.max = state.max(self.var);
    }

    fn restore(&self, state: &mut State) -> SolverResult<()> {
        state.set_range(self.var, self.min, self.max).map(|_| ())
    }
}

impl PartialEq for IntVarElement {
    fn eq(&self, other: &Self) -> bool {
        if self.var != other.var || self.activated != other.activated {
            return false;
        }
        if !self.activated && !other.activated {
            // Deactivated elements are equal regardless of their bounds.
            return true;
        }
        self.min == other.min && self.max == other.max
    }
}

#[derive(Clone, Debug)]
pub struct IntervalVarElement {
    var: IntervalId,
    name: String,
    start_min: IntCst,
    start_max: IntCst,
    duration_min: IntCst,
    duration_max: IntCst,
    end_min: IntCst,
    end_max: IntCst,
    performed_min: IntCst,
    performed_max: IntCst,
    activated: bool,
}

impl IntervalVarElement {
    fn new(var: IntervalId, name: String) -> Self {
        IntervalVarElement {
            var,
            name,
            start_min: INT_CST_MIN,
            start_max: INT_CST_MAX,
            duration_min: INT_CST_MIN,
            duration_max: INT_CST_MAX,
            end_min: INT_CST_MIN,
            end_max: INT_CST_MAX,
            performed_min: 0,
            performed_max: 1,
            activated: true,
        }
    }

    pub fn var(&self) -> IntervalId {
        self.var
    }

    pub fn start_min(&self) -> IntCst {
        self.start_min
    }

    pub fn start_max(&self) -> IntCst {
        self.start_max
    }

    pub fn duration_min(&self) -> IntCst {
        self.duration_min
    }

    pub fn duration_max(&self) -> IntCst {
        self.duration_max
    }

    pub fn end_min(&self) -> IntCst {
        self.end_min
    }

    pub fn end_max(&self) -> IntCst {
        self.end_max
    }

    pub fn performed_min(&self) -> IntCst {
        self.performed_min
    }

    pub fn performed_max(&self) -> IntCst {
        self.performed_max
    }

    pub fn activated(&self) -> bool {
        self.activated
    }

    pub fn activate(&mut self) {
        self.activated = true;
    }

    pub fn deactivate(&mut self) {
        self.activated = false;
    }

    fn store(&mut self, state: &State) {
        self.performed_min = IntCst::from(state.must_be_performed(self.var));
        self.performed_max = IntCst::from(state.may_be_performed(self.var));
        if self.performed_max != 0 {
            self.start_min = state.start_min(self.var);
            self.start_max = state.start_max(self.var);
            self.duration_min = state.duration_min(self.var);
            self.duration_max = state.duration_max(self.var);
            self.end_min = state.end_min(self.var);
            self.end_max = state.end_max(self.var);
        }
    }

    fn restore(&self, state: &mut State) -> SolverResult<()> {
        if self.performed_max == self.performed_min {
            state.set_performed(self.var, self.performed_min != 0)?;
        }
        if self.performed_max != 0 {
            state.set_start_range(self.var, self.start_min, self.start_max)?;
            state.set_duration_range(self.var, self.duration_min, self.duration_max)?;
            state.set_end_range(self.var, self.end_min, self.end_max)?;
        }
        Ok(())
    }
}

impl PartialEq for IntervalVarElement {
    fn eq(&self, other: &Self) -> bool {
        if self.var != other.var || self.activated != other.activated {
            return false;
        }
        if !self.activated && !other.activated {
            return true;
        }
        self.start_min == other.start_min
            && self.start_max == other.start_max
            && self.duration_min == other.duration_min
            && self.duration_max == other.duration_max
            && self.end_min == other.end_min
            && self.end_max == other.end_max
            && self.performed_min == other.performed_min
            && self.performed_max == other.performed_max
    }
}

#[derive(Clone, Debug)]
pub struct SequenceVarElement {
    var: SequenceId,
    name: String,
    sequence: Vec<i32>,
    activated: bool,
}

impl SequenceVarElement {
    fn new(var: SequenceId, name: String) -> Self {
        SequenceVarElement {
            var,
            name,
            sequence: Vec::new(),
            activated: true,
        }
    }

    pub fn var(&self) -> SequenceId {
        self.var
    }

    pub fn sequence(&self) -> &[i32] {
        &self.sequence
    }

    pub fn activated(&self) -> bool {
        self.activated
    }

    pub fn activate(&mut self) {
        self.activated = true;
    }

    pub fn deactivate(&mut self) {
        self.activated = false;
    }

    fn store(&mut self, state: &State) {
        self.sequence = state.fill_sequence(self.var);
    }

    fn restore(&self, state: &mut State) -> SolverResult<()> {
        for &pos in &self.sequence {
            state.rank_first(self.var, pos)?;
        }
        Ok(())
    }
}

impl PartialEq for SequenceVarElement {
    fn eq(&self, other: &Self) -> bool {
        if self.var != other.var || self.activated != other.activated {
            return false;
        }
        if !self.activated && !other.activated {
            return true;
        }
        self.sequence == other.sequence
    }
}

// ----- Containers -----

#[derive(Clone, Debug)]
struct Container<K, E> {
    elements: Vec<E>,
    index_of: HashMap<K, usize>,
}

impl<K, E> Default for Container<K, E> {
    fn default() -> Self {
        Container {
            elements: Vec::new(),
            index_of: HashMap::new(),
        }
    }
}

impl<K: Copy + Eq + std::hash::Hash, E> Container<K, E> {
    fn new() -> Self {
        Default::default()
    }

    fn add(&mut self, key: K, make: impl FnOnce() -> E) -> &mut E {
        let next = self.elements.len();
        let index = *self.index_of.entry(key).or_insert(next);
        if index == next {
            self.elements.push(make());
        }
        &mut self.elements[index]
    }

    fn get(&self, key: K) -> Option<&E> {
        self.index_of.get(&key).map(|&i| &self.elements[i])
    }

    fn get_mut(&mut self, key: K) -> Option<&mut E> {
        self.index_of.get(&key).map(|&i| &mut self.elements[i])
    }

    fn clear(&mut self) {
        self.elements.clear();
        self.index_of.clear();
    }

    fn len(&self) -> usize {
        self.elements.len()
    }
}

impl<K: Copy + Eq + std::hash::Hash, E: PartialEq> Container<K, E> {
    fn equivalent(&self, other: &Self, key: impl Fn(&E) -> K) -> bool {
        self.len() == other.len()
            && self
                .elements
                .iter()
                .all(|e| other.get(key(e)).is_some_and(|o| o == e))
    }
}

// ----- Records -----

/// Serialized form of an assignment element.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "kind")]
pub enum AssignmentRecord {
    IntVar {
        var_id: String,
        min: i64,
        max: i64,
        active: bool,
    },
    Interval {
        var_id: String,
        start_min: i64,
        start_max: i64,
        duration_min: i64,
        duration_max: i64,
        end_min: i64,
        end_max: i64,
        performed_min: i64,
        performed_max: i64,
        active: bool,
    },
    Sequence {
        var_id: String,
        active: bool,
        sequence: Vec<i32>,
    },
    Objective {
        var_id: String,
        min: i64,
        max: i64,
        active: bool,
    },
}

// ----- Assignment -----

#[derive(Clone, Default, Debug)]
pub struct Assignment {
    ints: Container<VarRef, IntVarElement>,
    intervals: Container<IntervalId, IntervalVarElement>,
    sequences: Container<SequenceId, SequenceVarElement>,
    objective: Option<IntVarElement>,
}

impl Assignment {
    pub fn new() -> Assignment {
        Assignment {
            ints: Container::new(),
            intervals: Container::new(),
            sequences: Container::new(),
            objective: None,
        }
    }

    // ----- Registration -----

    pub fn add(&mut self, solver: &Solver, var: VarRef) -> &mut IntVarElement {
        let name = solver.state.var_name(var).to_string();
        self.ints.add(var, || IntVarElement::new(var, name))
    }

    pub fn add_interval(&mut self, solver: &Solver, var: IntervalId) -> &mut IntervalVarElement {
        let name = solver.state.interval_name(var).to_string();
        self.intervals.add(var, || IntervalVarElement::new(var, name))
    }

    pub fn add_sequence(&mut self, solver: &Solver, var: SequenceId) -> &mut SequenceVarElement {
        let name = solver.state.sequence_name(var).to_string();
        self.sequences.add(var, || SequenceVarElement::new(var, name))
    }

    pub fn set_objective(&mut self, solver: &Solver, var: VarRef) {
        let name = solver.state.var_name(var).to_string();
        self.objective = Some(IntVarElement::new(var, name));
    }

    pub fn has_objective(&self) -> bool {
        self.objective.is_some()
    }

    pub fn objective(&self) -> Option<&IntVarElement> {
        self.objective.as_ref()
    }

    pub fn int_element(&self, var: VarRef) -> Option<&IntVarElement> {
        self.ints.get(var)
    }

    pub fn int_element_mut(&mut self, var: VarRef) -> Option<&mut IntVarElement> {
        self.ints.get_mut(var)
    }

    pub fn interval_element(&self, var: IntervalId) -> Option<&IntervalVarElement> {
        self.intervals.get(var)
    }

    pub fn interval_element_mut(&mut self, var: IntervalId) -> Option<&mut IntervalVarElement> {
        self.intervals.get_mut(var)
    }

    pub fn sequence_element(&self, var: SequenceId) -> Option<&SequenceVarElement> {
        self.sequences.get(var)
    }

    pub fn sequence_element_mut(&mut self, var: SequenceId) -> Option<&mut SequenceVarElement> {
        self.sequences.get_mut(var)
    }

    // ----- Store / restore -----

    /// Snapshots the current domains of every registered variable.
    pub fn store(&mut self, solver: &Solver) {
        let state = &solver.state;
        for e in &mut self.ints.elements {
            e.store(state);
        }
        for e in &mut self.intervals.elements {
            e.store(state);
        }
        for e in &mut self.sequences.elements {
            e.store(state);
        }
        if let Some(obj) = &mut self.objective {
            obj.store(state);
        }
    }

    /// Applies the stored domains back to the variables, atomically: the
    /// queue is frozen while the batch of setters runs and drained once at
    /// the end. Deactivated elements are skipped.
    pub fn restore(&self, solver: &mut Solver) -> SolverResult<()> {
        solver.freeze_queue();
        let applied = self.apply(&mut solver.state);
        match applied {
            Ok(()) => solver.unfreeze_queue(),
            Err(e) => {
                // Rebalance the freeze level; the failure empties the queue.
                let _ = solver.state.queue.unfreeze();
                solver.state.clear_queue_on_fail();
                Err(e)
            }
        }
    }

    fn apply(&self, state: &mut State) -> SolverResult<()> {
        for e in &self.ints.elements {
            if e.activated {
                e.restore(state)?;
            }
        }
        for e in &self.intervals.elements {
            if e.activated {
                e.restore(state)?;
            }
        }
        for e in &self.sequences.elements {
            if e.activated {
                e.restore(state)?;
            }
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        self.ints.clear();
        self.intervals.clear();
        self.sequences.clear();
        self.objective = None;
    }

    /// Replaces this assignment's contents with a copy of `other`.
    pub fn copy(&mut self, other: &Assignment) {
        self.ints = other.ints.clone();
        self.intervals = other.intervals.clone();
        self.sequences = other.sequences.clone();
        self.objective = other.objective.clone();
    }

    // ----- Save / load -----

    /// Writes one record per element, in registration order, the
    /// objective last. Elements with an empty variable name cannot be
    /// matched back and are skipped.
    pub fn save<W: Write>(&self, writer: W) -> anyhow::Result<()> {
        let mut writer = writer;
        let mut emit = |record: &AssignmentRecord| -> anyhow::Result<()> {
            serde_json::to_writer(&mut writer, record).context("writing assignment record")?;
            writer.write_all(b"\n").context("writing assignment record")?;
            Ok(())
        };
        for e in &self.ints.elements {
            if e.name.is_empty() {
                log::info!("Cannot save/load variables with empty name; variable will be ignored");
                continue;
            }
            emit(&AssignmentRecord::IntVar {
                var_id: e.name.clone(),
                min: e.min,
                max: e.max,
                active: e.activated,
            })?;
        }
        for e in &self.intervals.elements {
            if e.name.is_empty() {
                log::info!("Cannot save/load variables with empty name; variable will be ignored");
                continue;
            }
            emit(&AssignmentRecord::Interval {
                var_id: e.name.clone(),
                start_min: e.start_min,
                start_max: e.start_max,
                duration_min: e.duration_min,
                duration_max: e.duration_max,
                end_min: e.end_min,
                end_max: e.end_max,
                performed_min: e.performed_min,
                performed_max: e.performed_max,
                active: e.activated,
            })?;
        }
        for e in &self.sequences.elements {
            if e.name.is_empty() {
                log::info!("Cannot save/load variables with empty name; variable will be ignored");
                continue;
            }
            emit(&AssignmentRecord::Sequence {
                var_id: e.name.clone(),
                active: e.activated,
                sequence: e.sequence.clone(),
            })?;
        }
        if let Some(obj) = &self.objective {
            if !obj.name.is_empty() {
                emit(&AssignmentRecord::Objective {
                    var_id: obj.name.clone(),
                    min: obj.min,
                    max: obj.max,
                    active: obj.activated,
                })?;
            }
        }
        Ok(())
    }

    /// Reads records and assigns them to the registered elements.
    ///
    /// Returns `Ok(false)` when the body holds no record at all (a valid
    /// "no data" result); a truncated or malformed record is an error and
    /// leaves the assignment unchanged. Records naming unknown variables
    /// are skipped.
    pub fn load<R: Read>(&mut self, reader: R) -> anyhow::Result<bool> {
        let mut ints = Vec::new();
        let mut intervals = Vec::new();
        let mut sequences = Vec::new();
        let mut objective = None;
        let stream = serde_json::Deserializer::from_reader(reader).into_iter::<AssignmentRecord>();
        let mut empty = true;
        for record in stream {
            let record = record.context("reading assignment record")?;
            empty = false;
            match record {
                r @ AssignmentRecord::IntVar { .. } => ints.push(r),
                r @ AssignmentRecord::Interval { .. } => intervals.push(r),
                r @ AssignmentRecord::Sequence { .. } => sequences.push(r),
                r @ AssignmentRecord::Objective { .. } => objective = Some(r),
            }
        }
        if empty {
            return Ok(false);
        }

        load_container(&mut self.ints.elements, &ints, |e| &e.name, apply_int_record);
        load_container(&mut self.intervals.elements, &intervals, |e| &e.name, apply_interval_record);
        load_container(&mut self.sequences.elements, &sequences, |e| &e.name, apply_sequence_record);

        if let (Some(obj), Some(AssignmentRecord::Objective { var_id, min, max, active })) =
            (self.objective.as_mut(), objective.as_ref())
        {
            if &obj.name == var_id {
                obj.min = *min;
                obj.max = *max;
                obj.activated = *active;
            }
        }
        Ok(true)
    }

    pub fn save_to_file(&self, path: impl AsRef<std::path::Path>) -> bool {
        let path = path.as_ref();
        match std::fs::File::create(path).map_err(anyhow::Error::from).and_then(|f| self.save(f)) {
            Ok(()) => true,
            Err(e) => {
                log::info!("Cannot save assignment to {}: {e:#}", path.display());
                false
            }
        }
    }

    pub fn load_from_file(&mut self, path: impl AsRef<std::path::Path>) -> bool {
        let path = path.as_ref();
        match std::fs::File::open(path).map_err(anyhow::Error::from).and_then(|f| self.load(f)) {
            Ok(loaded) => loaded,
            Err(e) => {
                log::info!("Cannot load assignment from {}: {e:#}", path.display());
                false
            }
        }
    }
}

impl PartialEq for Assignment {
    fn eq(&self, other: &Self) -> bool {
        self.ints.equivalent(&other.ints, |e| e.var)
            && self.intervals.equivalent(&other.intervals, |e| e.var)
            && self.sequences.equivalent(&other.sequences, |e| e.var)
            && self.objective == other.objective
    }
}

fn record_name(record: &AssignmentRecord) -> &str {
    match record {
        AssignmentRecord::IntVar { var_id, .. }
        | AssignmentRecord::Interval { var_id, .. }
        | AssignmentRecord::Sequence { var_id, .. }
        | AssignmentRecord::Objective { var_id, .. } => var_id,
    }
}

fn apply_int_record(element: &mut IntVarElement, record: &AssignmentRecord) {
    if let AssignmentRecord::IntVar { min, max, active, .. } = record {
        element.min = *min;
        element.max = *max;
        element.activated = *active;
    }
}

fn apply_interval_record(element: &mut IntervalVarElement, record: &AssignmentRecord) {
    if let AssignmentRecord::Interval {
        start_min,
        start_max,
        duration_min,
        duration_max,
        end_min,
        end_max,
        performed_min,
        performed_max,
        active,
        ..
    } = record
    {
        element.start_min = *start_min;
        element.start_max = *start_max;
        element.duration_min = *duration_min;
        element.duration_max = *duration_max;
        element.end_min = *end_min;
        element.end_max = *end_max;
        element.performed_min = *performed_min;
        element.performed_max = *performed_max;
        element.activated = *active;
    }
}

fn apply_sequence_record(element: &mut SequenceVarElement, record: &AssignmentRecord) {
    if let AssignmentRecord::Sequence { active, sequence, .. } = record {
        element.sequence = sequence.clone();
        element.activated = *active;
    }
}

/// Positional fast path when names line up, name-keyed slow path
/// otherwise. Empty and duplicate names are logged and skipped.
fn load_container<E>(
    elements: &mut [E],
    records: &[AssignmentRecord],
    name_of: impl Fn(&E) -> &str,
    apply: impl Fn(&mut E, &AssignmentRecord),
) {
    let mut fast_load = elements.len() == records.len();
    if fast_load {
        for (element, record) in elements.iter_mut().zip(records.iter()) {
            if name_of(element) == record_name(record) {
                apply(element, record);
            } else {
                fast_load = false;
                break;
            }
        }
    }
    if !fast_load {
        let mut by_name: HashMap<&str, usize> = HashMap::new();
        for (i, e) in elements.iter().enumerate() {
            let name = name_of(e);
            if name.is_empty() {
                log::info!("Cannot save/load variables with empty name; variable will be ignored");
            } else if by_name.contains_key(name) {
                log::info!("Cannot save/load variables with duplicate names: {name}; variable will be ignored");
            } else {
                by_name.insert(name, i);
            }
        }
        let resolved: Vec<(usize, &AssignmentRecord)> = records
            .iter()
            .filter_map(|r| match by_name.get(record_name(r)) {
                Some(&i) => Some((i, r)),
                None => {
                    log::info!("Variable {} not in assignment; skipping variable", record_name(r));
                    None
                }
            })
            .collect();
        for (i, r) in resolved {
            apply(&mut elements[i], r);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_restore_int() {
        let mut s = Solver::new();
        let a = s.new_int_var(0, 10, "a");
        let mut assignment = Assignment::new();
        assignment.add(&s, a);
        s.state.set_range(a, 2, 7).unwrap();
        s.propagate().unwrap();
        assignment.store(&s);

        let mut s2 = Solver::new();
        let a2 = s2.new_int_var(0, 10, "a");
        let mut assignment2 = Assignment::new();
        assignment2.add(&s2, a2);
        assignment2.copy(&assignment);
        // Copied element refers to the original var handle, which maps to
        // the same arena slot in the twin solver.
        assignment2.restore(&mut s2).unwrap();
        assert_eq!((s2.state.min(a2), s2.state.max(a2)), (2, 7));
    }

    #[test]
    fn test_deactivated_elements_compare_equal() {
        let mut s = Solver::new();
        let a = s.new_int_var(0, 10, "a");
        let mut x = Assignment::new();
        x.add(&s, a).set_range(1, 2);
        let mut y = Assignment::new();
        y.add(&s, a).set_range(5, 6);
        assert_ne!(x, y);
        x.int_element_mut(a).unwrap().deactivate();
        y.int_element_mut(a).unwrap().deactivate();
        assert_eq!(x, y);
    }

    #[test]
    fn test_save_load_round_trip() {
        let mut s = Solver::new();
        let a = s.new_int_var(0, 5, "a");
        let i = s.make_interval_var(0, 10, 3, 5, 0, 12, false, "i");
        let seq = s.make_sequence(&[i], "seq");
        let mut assignment = Assignment::new();
        assignment.add(&s, a);
        assignment.add_interval(&s, i);
        assignment.add_sequence(&s, seq);
        assignment.store(&s);

        let mut buffer = Vec::new();
        assignment.save(&mut buffer).unwrap();

        let mut reloaded = Assignment::new();
        reloaded.add(&s, a);
        reloaded.add_interval(&s, i);
        reloaded.add_sequence(&s, seq);
        assert!(reloaded.load(buffer.as_slice()).unwrap());
        assert_eq!(assignment, reloaded);
    }

    #[test]
    fn test_load_empty_body() {
        let mut s = Solver::new();
        let a = s.new_int_var(0, 5, "a");
        let mut assignment = Assignment::new();
        assignment.add(&s, a);
        assert!(!assignment.load(&b""[..]).unwrap());
    }

    #[test]
    fn test_load_truncated_record_is_an_error() {
        let mut s = Solver::new();
        let a = s.new_int_var(0, 5, "a");
        let mut assignment = Assignment::new();
        assignment.add(&s, a);
        let truncated = br#"{"kind":"IntVar","var_id":"a","min":0,"#;
        assert!(assignment.load(&truncated[..]).is_err());
    }

    #[test]
    fn test_load_by_name_slow_path() {
        let mut s = Solver::new();
        let a = s.new_int_var(0, 5, "a");
        let b = s.new_int_var(0, 5, "b");
        let mut saved = Assignment::new();
        saved.add(&s, a).set_value(1);
        saved.add(&s, b).set_value(2);
        let mut buffer = Vec::new();
        saved.save(&mut buffer).unwrap();

        // Register in the opposite order: positional matching fails and
        // the name map takes over.
        let mut loaded = Assignment::new();
        loaded.add(&s, b);
        loaded.add(&s, a);
        assert!(loaded.load(buffer.as_slice()).unwrap());
        assert_eq!(loaded.int_element(a).unwrap().min(), 1);
        assert_eq!(loaded.int_element(b).unwrap().min(), 2);
    }
}
