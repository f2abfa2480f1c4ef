//! Interval variables.
//!
//! An interval variable is a composite of four storages (start, duration,
//! end, performed) tied by `start + duration = end` whenever the interval
//! is performed. The concrete variants own their storages; all the other
//! variants are storage-free views that rewrite every query and mutation
//! onto an underlying interval.
//!
//! Setters on an optional interval whose performed status is undecided
//! never fail: an inconsistent update forces `performed = false` instead,
//! and only propagates a failure if the interval is required.

use crate::core::state::{Entity, FiredDemons, State, UndoEvent};
use crate::core::{cap_add, cap_sub, DemonId, Failure, IntCst, IntervalId, SolverResult};
use crate::core::{INT_CST_MAX, INT_CST_MIN, MAX_VALID_VALUE, MIN_VALID_VALUE};
use crate::core::VarRef;

/// Field of an interval variable backed by its own storage.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Field {
    Start,
    Duration,
    End,
}

/// Three-state value of a performed flag.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BoolStatus {
    False,
    True,
    Undecided,
}

/// Reversible `[min, max]` storage with the lazy previous bounds and the
/// postponed bounds used while the owning interval is in process.
pub(crate) struct FieldStorage {
    pub min: IntCst,
    pub max: IntCst,
    pub postponed_min: IntCst,
    pub postponed_max: IntCst,
    pub previous_min: IntCst,
    pub previous_max: IntCst,
    range_demons: Vec<DemonId>,
    bound_demons: Vec<DemonId>,
}

impl FieldStorage {
    fn new(min: IntCst, max: IntCst) -> Self {
        FieldStorage {
            min,
            max,
            postponed_min: min,
            postponed_max: max,
            previous_min: min,
            previous_max: max,
            range_demons: Vec::new(),
            bound_demons: Vec::new(),
        }
    }

    fn bound(&self) -> bool {
        self.min == self.max
    }

    fn changed(&self) -> bool {
        self.min != self.previous_min || self.max != self.previous_max
    }

    // After a backtrack the previous bounds may lie strictly inside the
    // current domain; modifications are otherwise monotonic.
    fn sync_previous(&mut self) {
        if self.previous_min > self.min {
            self.previous_min = self.min;
        }
        if self.previous_max < self.max {
            self.previous_max = self.max;
        }
    }
}

/// Three-state storage for the performed flag, with the same lazy
/// previous / postponed scheme as the bound storages.
pub(crate) struct PerformedStorage {
    pub status: BoolStatus,
    pub previous: BoolStatus,
    pub postponed: BoolStatus,
    demons: Vec<DemonId>,
}

impl PerformedStorage {
    fn new(optional: bool) -> Self {
        let status = if optional { BoolStatus::Undecided } else { BoolStatus::True };
        PerformedStorage {
            status,
            previous: status,
            postponed: status,
            demons: Vec::new(),
        }
    }

    fn may_be_true(&self) -> bool {
        self.status != BoolStatus::False
    }

    fn must_be_true(&self) -> bool {
        self.status == BoolStatus::True
    }

    fn bound(&self) -> bool {
        self.status != BoolStatus::Undecided
    }
}

fn status_of(value: bool) -> BoolStatus {
    if value {
        BoolStatus::True
    } else {
        BoolStatus::False
    }
}

pub(crate) struct FixedDurationData {
    start: FieldStorage,
    duration: IntCst,
    performed: PerformedStorage,
    in_process: bool,
    enqueued: bool,
    name: String,
}

pub(crate) struct VariableDurationData {
    start: FieldStorage,
    duration: FieldStorage,
    end: FieldStorage,
    performed: PerformedStorage,
    in_process: bool,
    enqueued: bool,
    name: String,
}

pub(crate) struct FixedData {
    start: IntCst,
    duration: IntCst,
    name: String,
}

pub(crate) struct StartVarData {
    start: VarRef,
    duration: IntCst,
    name: String,
}

pub(crate) struct ViewData {
    of: IntervalId,
    name: String,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum SyncAnchor {
    Start,
    End,
}

pub(crate) struct SyncedData {
    of: IntervalId,
    anchor: SyncAnchor,
    duration: IntCst,
    offset: IntCst,
    name: String,
}

pub(crate) enum IntervalData {
    FixedDuration(FixedDurationData),
    VariableDuration(VariableDurationData),
    Fixed(FixedData),
    StartVar(StartVarData),
    Mirror(ViewData),
    RelaxedMin(ViewData),
    RelaxedMax(ViewData),
    StartSynced(SyncedData),
}

impl IntervalData {
    fn storage_mut(&mut self, f: Field) -> &mut FieldStorage {
        match (self, f) {
            (IntervalData::FixedDuration(d), Field::Start) => &mut d.start,
            (IntervalData::VariableDuration(d), Field::Start) => &mut d.start,
            (IntervalData::VariableDuration(d), Field::Duration) => &mut d.duration,
            (IntervalData::VariableDuration(d), Field::End) => &mut d.end,
            _ => unreachable!("interval field {f:?} has no storage"),
        }
    }

    fn performed(&self) -> &PerformedStorage {
        match self {
            IntervalData::FixedDuration(d) => &d.performed,
            IntervalData::VariableDuration(d) => &d.performed,
            _ => unreachable!("interval has no performed storage"),
        }
    }

    fn performed_mut(&mut self) -> &mut PerformedStorage {
        match self {
            IntervalData::FixedDuration(d) => &mut d.performed,
            IntervalData::VariableDuration(d) => &mut d.performed,
            _ => unreachable!("interval has no performed storage"),
        }
    }

    pub(crate) fn undo_min(&mut self, f: Field, prev: IntCst) {
        self.storage_mut(f).min = prev;
    }

    pub(crate) fn undo_max(&mut self, f: Field, prev: IntCst) {
        self.storage_mut(f).max = prev;
    }

    pub(crate) fn undo_performed(&mut self, prev: BoolStatus) {
        self.performed_mut().status = prev;
    }

    pub(crate) fn clear_enqueued(&mut self) {
        match self {
            IntervalData::FixedDuration(d) => d.enqueued = false,
            IntervalData::VariableDuration(d) => d.enqueued = false,
            _ => {}
        }
    }

    pub(crate) fn clear_in_process(&mut self) {
        match self {
            IntervalData::FixedDuration(d) => d.in_process = false,
            IntervalData::VariableDuration(d) => d.in_process = false,
            _ => {}
        }
    }

    fn in_process(&self) -> bool {
        match self {
            IntervalData::FixedDuration(d) => d.in_process,
            IntervalData::VariableDuration(d) => d.in_process,
            _ => false,
        }
    }
}

/// Outcome of a raw storage update.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Outcome {
    NoOp,
    Inconsistent,
    Push,
}

fn clamp_valid(v: IntCst) -> IntCst {
    v.clamp(MIN_VALID_VALUE, MAX_VALID_VALUE)
}

impl State {
    // =========== Construction ===========

    pub fn new_fixed_duration_interval(
        &mut self,
        start_min: IntCst,
        start_max: IntCst,
        duration: IntCst,
        optional: bool,
        name: impl Into<String>,
    ) -> IntervalId {
        let start_min = clamp_valid(start_min);
        let start_max = clamp_valid(start_max);
        assert!(start_min <= start_max, "empty start range for interval");
        assert!(duration >= 0, "negative interval duration");
        self.intervals.push(IntervalData::FixedDuration(FixedDurationData {
            start: FieldStorage::new(start_min, start_max),
            duration,
            performed: PerformedStorage::new(optional),
            in_process: false,
            enqueued: false,
            name: name.into(),
        }))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn new_variable_duration_interval(
        &mut self,
        start_min: IntCst,
        start_max: IntCst,
        duration_min: IntCst,
        duration_max: IntCst,
        end_min: IntCst,
        end_max: IntCst,
        optional: bool,
        name: impl Into<String>,
    ) -> IntervalId {
        let start_min = clamp_valid(start_min);
        let start_max = clamp_valid(start_max);
        let end_min = clamp_valid(end_min);
        let end_max = clamp_valid(end_max);
        // Initial intersection so the interval starts in a consistent
        // minimal state.
        let start = FieldStorage::new(
            start_min.max(cap_sub(end_min, duration_max)),
            start_max.min(cap_sub(end_max, duration_min)),
        );
        let duration = FieldStorage::new(
            duration_min.max(cap_sub(end_min, start_max)),
            duration_max.min(cap_sub(end_max, start_min)),
        );
        let end = FieldStorage::new(
            end_min.max(cap_add(start_min, duration_min)),
            end_max.min(cap_add(start_max, duration_max)),
        );
        assert!(
            start.min <= start.max && duration.min <= duration.max && end.min <= end.max,
            "empty interval domain"
        );
        self.intervals.push(IntervalData::VariableDuration(VariableDurationData {
            start,
            duration,
            end,
            performed: PerformedStorage::new(optional),
            in_process: false,
            enqueued: false,
            name: name.into(),
        }))
    }

    pub fn new_fixed_interval(&mut self, start: IntCst, duration: IntCst, name: impl Into<String>) -> IntervalId {
        assert!(duration >= 0, "negative interval duration");
        self.intervals.push(IntervalData::Fixed(FixedData {
            start: clamp_valid(start),
            duration,
            name: name.into(),
        }))
    }

    pub fn new_start_var_interval(&mut self, start: VarRef, duration: IntCst, name: impl Into<String>) -> IntervalId {
        assert!(duration >= 0, "negative interval duration");
        self.intervals.push(IntervalData::StartVar(StartVarData {
            start,
            duration,
            name: name.into(),
        }))
    }

    pub fn new_mirror_interval(&mut self, of: IntervalId) -> IntervalId {
        let name = format!("Mirror<{}>", self.interval_name(of));
        self.intervals.push(IntervalData::Mirror(ViewData { of, name }))
    }

    pub fn new_relaxed_min_interval(&mut self, of: IntervalId) -> IntervalId {
        let name = format!("RelaxedMin<{}>", self.interval_name(of));
        self.intervals.push(IntervalData::RelaxedMin(ViewData { of, name }))
    }

    pub fn new_relaxed_max_interval(&mut self, of: IntervalId) -> IntervalId {
        let name = format!("RelaxedMax<{}>", self.interval_name(of));
        self.intervals.push(IntervalData::RelaxedMax(ViewData { of, name }))
    }

    pub(crate) fn new_synced_interval(
        &mut self,
        of: IntervalId,
        anchor: SyncAnchor,
        duration: IntCst,
        offset: IntCst,
    ) -> IntervalId {
        let name = match anchor {
            SyncAnchor::Start => format!("StartSyncedOnStart<{}>", self.interval_name(of)),
            SyncAnchor::End => format!("StartSyncedOnEnd<{}>", self.interval_name(of)),
        };
        self.intervals.push(IntervalData::StartSynced(SyncedData {
            of,
            anchor,
            duration,
            offset,
            name,
        }))
    }

    pub fn interval_name(&self, i: IntervalId) -> &str {
        match &self.intervals[i] {
            IntervalData::FixedDuration(d) => &d.name,
            IntervalData::VariableDuration(d) => &d.name,
            IntervalData::Fixed(d) => &d.name,
            IntervalData::StartVar(d) => &d.name,
            IntervalData::Mirror(v) | IntervalData::RelaxedMin(v) | IntervalData::RelaxedMax(v) => &v.name,
            IntervalData::StartSynced(s) => &s.name,
        }
    }

    // =========== Performed status ===========

    pub fn may_be_performed(&self, i: IntervalId) -> bool {
        match &self.intervals[i] {
            IntervalData::FixedDuration(_) | IntervalData::VariableDuration(_) => {
                self.intervals[i].performed().may_be_true()
            }
            IntervalData::Fixed(_) | IntervalData::StartVar(_) => true,
            // Relaxed views are always performed by contract.
            IntervalData::RelaxedMin(_) | IntervalData::RelaxedMax(_) => true,
            IntervalData::Mirror(v) => self.may_be_performed(v.of),
            IntervalData::StartSynced(s) => self.may_be_performed(s.of),
        }
    }

    pub fn must_be_performed(&self, i: IntervalId) -> bool {
        match &self.intervals[i] {
            IntervalData::FixedDuration(_) | IntervalData::VariableDuration(_) => {
                self.intervals[i].performed().must_be_true()
            }
            IntervalData::Fixed(_) | IntervalData::StartVar(_) => true,
            IntervalData::RelaxedMin(_) | IntervalData::RelaxedMax(_) => true,
            IntervalData::Mirror(v) => self.must_be_performed(v.of),
            IntervalData::StartSynced(s) => self.must_be_performed(s.of),
        }
    }

    pub fn was_performed_bound(&self, i: IntervalId) -> bool {
        match &self.intervals[i] {
            IntervalData::FixedDuration(_) | IntervalData::VariableDuration(_) => {
                self.intervals[i].performed().previous != BoolStatus::Undecided
            }
            IntervalData::Fixed(_) | IntervalData::StartVar(_) => true,
            IntervalData::RelaxedMin(_) | IntervalData::RelaxedMax(_) => true,
            IntervalData::Mirror(v) => self.was_performed_bound(v.of),
            IntervalData::StartSynced(s) => self.was_performed_bound(s.of),
        }
    }

    pub fn set_performed(&mut self, i: IntervalId, value: bool) -> SolverResult<()> {
        match &self.intervals[i] {
            IntervalData::FixedDuration(_) | IntervalData::VariableDuration(_) => {
                if self.intervals[i].in_process() {
                    self.performed_set_in_process(i, value)
                } else if self.performed_set_raw(i, value)? {
                    self.push_interval(i)
                } else {
                    Ok(())
                }
            }
            IntervalData::Fixed(_) | IntervalData::StartVar(_) => {
                if value {
                    Ok(())
                } else {
                    Err(Failure)
                }
            }
            // A relaxed view is always performed: requiring it is a no-op
            // and forbidding it is inconsistent.
            IntervalData::RelaxedMin(_) | IntervalData::RelaxedMax(_) => {
                if value {
                    Ok(())
                } else {
                    Err(Failure)
                }
            }
            IntervalData::Mirror(v) => {
                let of = v.of;
                self.set_performed(of, value)
            }
            IntervalData::StartSynced(s) => {
                let of = s.of;
                self.set_performed(of, value)
            }
        }
    }

    /// Updates the performed storage without pushing the interval.
    /// Returns true if the status changed.
    fn performed_set_raw(&mut self, i: IntervalId, value: bool) -> SolverResult<bool> {
        let p = self.intervals[i].performed_mut();
        match p.status {
            BoolStatus::Undecided => {
                p.previous = BoolStatus::Undecided;
                p.status = status_of(value);
                self.trail.push(UndoEvent::Performed {
                    interval: i,
                    prev: BoolStatus::Undecided,
                });
                Ok(true)
            }
            s if s == status_of(value) => Ok(false),
            _ => Err(Failure),
        }
    }

    fn performed_set_in_process(&mut self, i: IntervalId, value: bool) -> SolverResult<()> {
        let p = self.intervals[i].performed_mut();
        match p.status {
            BoolStatus::Undecided => match p.postponed {
                BoolStatus::Undecided => {
                    p.postponed = status_of(value);
                    Ok(())
                }
                s if s == status_of(value) => Ok(()),
                _ => Err(Failure),
            },
            s if s == status_of(value) => Ok(()),
            _ => Err(Failure),
        }
    }

    // =========== Queries ===========

    pub fn start_min(&self, i: IntervalId) -> IntCst {
        match &self.intervals[i] {
            IntervalData::FixedDuration(d) => {
                debug_assert!(d.performed.may_be_true());
                d.start.min
            }
            IntervalData::VariableDuration(d) => {
                debug_assert!(d.performed.may_be_true());
                d.start.min
            }
            IntervalData::Fixed(d) => d.start,
            IntervalData::StartVar(d) => self.min(d.start),
            IntervalData::Mirror(v) => -self.end_max(v.of),
            IntervalData::RelaxedMin(v) => {
                if self.must_be_performed(v.of) {
                    self.start_min(v.of)
                } else {
                    MIN_VALID_VALUE
                }
            }
            IntervalData::RelaxedMax(v) => {
                if self.may_be_performed(v.of) {
                    self.start_min(v.of)
                } else {
                    MIN_VALID_VALUE
                }
            }
            IntervalData::StartSynced(s) => match s.anchor {
                SyncAnchor::Start => cap_add(self.start_min(s.of), s.offset),
                SyncAnchor::End => cap_add(self.end_min(s.of), s.offset),
            },
        }
    }

    pub fn start_max(&self, i: IntervalId) -> IntCst {
        match &self.intervals[i] {
            IntervalData::FixedDuration(d) => {
                debug_assert!(d.performed.may_be_true());
                d.start.max
            }
            IntervalData::VariableDuration(d) => {
                debug_assert!(d.performed.may_be_true());
                d.start.max
            }
            IntervalData::Fixed(d) => d.start,
            IntervalData::StartVar(d) => self.max(d.start),
            IntervalData::Mirror(v) => -self.end_min(v.of),
            IntervalData::RelaxedMin(v) => {
                if self.may_be_performed(v.of) {
                    self.start_max(v.of)
                } else {
                    MAX_VALID_VALUE
                }
            }
            IntervalData::RelaxedMax(v) => {
                if self.must_be_performed(v.of) {
                    self.start_max(v.of)
                } else {
                    cap_sub(MAX_VALID_VALUE, self.duration_min(i))
                }
            }
            IntervalData::StartSynced(s) => match s.anchor {
                SyncAnchor::Start => cap_add(self.start_max(s.of), s.offset),
                SyncAnchor::End => cap_add(self.end_max(s.of), s.offset),
            },
        }
    }

    pub fn duration_min(&self, i: IntervalId) -> IntCst {
        match &self.intervals[i] {
            IntervalData::FixedDuration(d) => {
                debug_assert!(d.performed.may_be_true());
                d.duration
            }
            IntervalData::VariableDuration(d) => {
                debug_assert!(d.performed.may_be_true());
                d.duration.min
            }
            IntervalData::Fixed(d) => d.duration,
            IntervalData::StartVar(d) => d.duration,
            IntervalData::Mirror(v) => self.duration_min(v.of),
            IntervalData::RelaxedMin(v) | IntervalData::RelaxedMax(v) => {
                if self.may_be_performed(v.of) {
                    self.duration_min(v.of)
                } else {
                    0
                }
            }
            IntervalData::StartSynced(s) => s.duration,
        }
    }

    pub fn duration_max(&self, i: IntervalId) -> IntCst {
        match &self.intervals[i] {
            IntervalData::FixedDuration(d) => {
                debug_assert!(d.performed.may_be_true());
                d.duration
            }
            IntervalData::VariableDuration(d) => {
                debug_assert!(d.performed.may_be_true());
                d.duration.max
            }
            IntervalData::Fixed(d) => d.duration,
            IntervalData::StartVar(d) => d.duration,
            IntervalData::Mirror(v) => self.duration_max(v.of),
            IntervalData::RelaxedMin(v) | IntervalData::RelaxedMax(v) => {
                if self.may_be_performed(v.of) {
                    self.duration_max(v.of)
                } else {
                    0
                }
            }
            IntervalData::StartSynced(s) => s.duration,
        }
    }

    pub fn end_min(&self, i: IntervalId) -> IntCst {
        match &self.intervals[i] {
            IntervalData::FixedDuration(d) => {
                debug_assert!(d.performed.may_be_true());
                cap_add(d.start.min, d.duration)
            }
            IntervalData::VariableDuration(d) => {
                debug_assert!(d.performed.may_be_true());
                d.end.min
            }
            IntervalData::Fixed(d) => d.start + d.duration,
            IntervalData::StartVar(d) => cap_add(self.min(d.start), d.duration),
            IntervalData::Mirror(v) => -self.start_max(v.of),
            IntervalData::RelaxedMin(v) => {
                if self.must_be_performed(v.of) {
                    self.end_min(v.of)
                } else {
                    cap_add(MIN_VALID_VALUE, self.duration_min(i))
                }
            }
            IntervalData::RelaxedMax(v) => {
                if self.may_be_performed(v.of) {
                    self.end_min(v.of)
                } else {
                    MIN_VALID_VALUE
                }
            }
            IntervalData::StartSynced(_) => cap_add(self.start_min(i), self.duration_min(i)),
        }
    }

    pub fn end_max(&self, i: IntervalId) -> IntCst {
        match &self.intervals[i] {
            IntervalData::FixedDuration(d) => {
                debug_assert!(d.performed.may_be_true());
                cap_add(d.start.max, d.duration)
            }
            IntervalData::VariableDuration(d) => {
                debug_assert!(d.performed.may_be_true());
                d.end.max
            }
            IntervalData::Fixed(d) => d.start + d.duration,
            IntervalData::StartVar(d) => cap_add(self.max(d.start), d.duration),
            IntervalData::Mirror(v) => -self.start_min(v.of),
            IntervalData::RelaxedMin(v) => {
                if self.may_be_performed(v.of) {
                    self.end_max(v.of)
                } else {
                    MAX_VALID_VALUE
                }
            }
            IntervalData::RelaxedMax(v) => {
                if self.must_be_performed(v.of) {
                    self.end_max(v.of)
                } else {
                    MAX_VALID_VALUE
                }
            }
            IntervalData::StartSynced(_) => cap_add(self.start_max(i), self.duration_min(i)),
        }
    }

    // =========== Previous bounds ===========

    pub fn old_start_min(&self, i: IntervalId) -> IntCst {
        match &self.intervals[i] {
            IntervalData::FixedDuration(d) => d.start.previous_min,
            IntervalData::VariableDuration(d) => d.start.previous_min,
            IntervalData::Fixed(d) => d.start,
            IntervalData::StartVar(d) => self.old_min(d.start),
            IntervalData::Mirror(v) => -self.old_end_max(v.of),
            IntervalData::RelaxedMin(v) | IntervalData::RelaxedMax(v) => {
                if self.may_be_performed(v.of) {
                    self.old_start_min(v.of)
                } else {
                    MIN_VALID_VALUE
                }
            }
            IntervalData::StartSynced(s) => match s.anchor {
                SyncAnchor::Start => cap_add(self.old_start_min(s.of), s.offset),
                SyncAnchor::End => cap_add(self.old_end_min(s.of), s.offset),
            },
        }
    }

    pub fn old_start_max(&self, i: IntervalId) -> IntCst {
        match &self.intervals[i] {
            IntervalData::FixedDuration(d) => d.start.previous_max,
            IntervalData::VariableDuration(d) => d.start.previous_max,
            IntervalData::Fixed(d) => d.start,
            IntervalData::StartVar(d) => self.old_max(d.start),
            IntervalData::Mirror(v) => -self.old_end_min(v.of),
            IntervalData::RelaxedMin(v) | IntervalData::RelaxedMax(v) => {
                if self.may_be_performed(v.of) {
                    self.old_start_max(v.of)
                } else {
                    MAX_VALID_VALUE
                }
            }
            IntervalData::StartSynced(s) => match s.anchor {
                SyncAnchor::Start => cap_add(self.old_start_max(s.of), s.offset),
                SyncAnchor::End => cap_add(self.old_end_max(s.of), s.offset),
            },
        }
    }

    pub fn old_duration_min(&self, i: IntervalId) -> IntCst {
        match &self.intervals[i] {
            IntervalData::VariableDuration(d) => d.duration.previous_min,
            _ => self.duration_min(i),
        }
    }

    pub fn old_duration_max(&self, i: IntervalId) -> IntCst {
        match &self.intervals[i] {
            IntervalData::VariableDuration(d) => d.duration.previous_max,
            _ => self.duration_max(i),
        }
    }

    pub fn old_end_min(&self, i: IntervalId) -> IntCst {
        match &self.intervals[i] {
            IntervalData::FixedDuration(d) => cap_add(d.start.previous_min, d.duration),
            IntervalData::VariableDuration(d) => d.end.previous_min,
            IntervalData::Mirror(v) => -self.old_start_max(v.of),
            _ => cap_add(self.old_start_min(i), self.duration_min(i)),
        }
    }

    pub fn old_end_max(&self, i: IntervalId) -> IntCst {
        match &self.intervals[i] {
            IntervalData::FixedDuration(d) => cap_add(d.start.previous_max, d.duration),
            IntervalData::VariableDuration(d) => d.end.previous_max,
            IntervalData::Mirror(v) => -self.old_start_min(v.of),
            _ => cap_add(self.old_start_max(i), self.duration_min(i)),
        }
    }

    // =========== Setters ===========

    pub fn set_start_min(&mut self, i: IntervalId, m: IntCst) -> SolverResult<()> {
        match &self.intervals[i] {
            IntervalData::FixedDuration(_) | IntervalData::VariableDuration(_) => {
                self.set_storage(i, Field::Start, m, INT_CST_MAX)
            }
            IntervalData::Fixed(d) => {
                if m > d.start {
                    Err(Failure)
                } else {
                    Ok(())
                }
            }
            IntervalData::StartVar(d) => {
                let v = d.start;
                self.set_min(v, m).map(|_| ())
            }
            IntervalData::Mirror(v) => {
                let of = v.of;
                self.set_end_max(of, -m)
            }
            IntervalData::RelaxedMin(_) => {
                panic!("set_start_min is not supported on a relaxed-min interval view")
            }
            IntervalData::RelaxedMax(v) => {
                let of = v.of;
                self.set_start_min(of, m)
            }
            IntervalData::StartSynced(s) => {
                let (of, anchor, offset) = (s.of, s.anchor, s.offset);
                match anchor {
                    SyncAnchor::Start => self.set_start_min(of, cap_sub(m, offset)),
                    SyncAnchor::End => self.set_end_min(of, cap_sub(m, offset)),
                }
            }
        }
    }

    pub fn set_start_max(&mut self, i: IntervalId, m: IntCst) -> SolverResult<()> {
        match &self.intervals[i] {
            IntervalData::FixedDuration(_) | IntervalData::VariableDuration(_) => {
                self.set_storage(i, Field::Start, INT_CST_MIN, m)
            }
            IntervalData::Fixed(d) => {
                if m < d.start {
                    Err(Failure)
                } else {
                    Ok(())
                }
            }
            IntervalData::StartVar(d) => {
                let v = d.start;
                self.set_max(v, m).map(|_| ())
            }
            IntervalData::Mirror(v) => {
                let of = v.of;
                self.set_end_min(of, -m)
            }
            IntervalData::RelaxedMin(v) => {
                let of = v.of;
                self.set_start_max(of, m)
            }
            IntervalData::RelaxedMax(_) => {
                panic!("set_start_max is not supported on a relaxed-max interval view")
            }
            IntervalData::StartSynced(s) => {
                let (of, anchor, offset) = (s.of, s.anchor, s.offset);
                match anchor {
                    SyncAnchor::Start => self.set_start_max(of, cap_sub(m, offset)),
                    SyncAnchor::End => self.set_end_max(of, cap_sub(m, offset)),
                }
            }
        }
    }

    pub fn set_start_range(&mut self, i: IntervalId, mi: IntCst, ma: IntCst) -> SolverResult<()> {
        match &self.intervals[i] {
            IntervalData::FixedDuration(_) | IntervalData::VariableDuration(_) => {
                self.set_storage(i, Field::Start, mi, ma)
            }
            IntervalData::Mirror(v) => {
                let of = v.of;
                self.set_end_range(of, -ma, -mi)
            }
            IntervalData::StartSynced(s) => {
                let (of, anchor, offset) = (s.of, s.anchor, s.offset);
                match anchor {
                    SyncAnchor::Start => self.set_start_range(of, cap_sub(mi, offset), cap_sub(ma, offset)),
                    SyncAnchor::End => self.set_end_range(of, cap_sub(mi, offset), cap_sub(ma, offset)),
                }
            }
            // The always-performed wrappers pass range updates through to
            // the underlying interval unchecked.
            IntervalData::RelaxedMin(v) | IntervalData::RelaxedMax(v) => {
                let of = v.of;
                self.set_start_range(of, mi, ma)
            }
            _ => {
                self.set_start_min(i, mi)?;
                self.set_start_max(i, ma)
            }
        }
    }

    pub fn set_duration_min(&mut self, i: IntervalId, m: IntCst) -> SolverResult<()> {
        match &self.intervals[i] {
            IntervalData::VariableDuration(_) => self.set_storage(i, Field::Duration, m, INT_CST_MAX),
            IntervalData::FixedDuration(d) => {
                let duration = d.duration;
                if m > duration {
                    self.set_performed(i, false)
                } else {
                    Ok(())
                }
            }
            IntervalData::Fixed(d) => {
                if m > d.duration {
                    Err(Failure)
                } else {
                    Ok(())
                }
            }
            IntervalData::StartVar(d) => {
                if m > d.duration {
                    Err(Failure)
                } else {
                    Ok(())
                }
            }
            IntervalData::Mirror(v) => {
                let of = v.of;
                self.set_duration_min(of, m)
            }
            IntervalData::RelaxedMin(v) | IntervalData::RelaxedMax(v) => {
                let of = v.of;
                self.set_duration_min(of, m)
            }
            IntervalData::StartSynced(s) => {
                if m > s.duration {
                    Err(Failure)
                } else {
                    Ok(())
                }
            }
        }
    }

    pub fn set_duration_max(&mut self, i: IntervalId, m: IntCst) -> SolverResult<()> {
        match &self.intervals[i] {
            IntervalData::VariableDuration(_) => self.set_storage(i, Field::Duration, INT_CST_MIN, m),
            IntervalData::FixedDuration(d) => {
                let duration = d.duration;
                if m < duration {
                    self.set_performed(i, false)
                } else {
                    Ok(())
                }
            }
            IntervalData::Fixed(d) => {
                if m < d.duration {
                    Err(Failure)
                } else {
                    Ok(())
                }
            }
            IntervalData::StartVar(d) => {
                if m < d.duration {
                    Err(Failure)
                } else {
                    Ok(())
                }
            }
            IntervalData::Mirror(v) | IntervalData::RelaxedMin(v) | IntervalData::RelaxedMax(v) => {
                let of = v.of;
                self.set_duration_max(of, m)
            }
            IntervalData::StartSynced(s) => {
                if m < s.duration {
                    Err(Failure)
                } else {
                    Ok(())
                }
            }
        }
    }

    pub fn set_duration_range(&mut self, i: IntervalId, mi: IntCst, ma: IntCst) -> SolverResult<()> {
        match &self.intervals[i] {
            IntervalData::VariableDuration(_) => self.set_storage(i, Field::Duration, mi, ma),
            _ => {
                self.set_duration_min(i, mi)?;
                self.set_duration_max(i, ma)
            }
        }
    }

    pub fn set_end_min(&mut self, i: IntervalId, m: IntCst) -> SolverResult<()> {
        match &self.intervals[i] {
            IntervalData::VariableDuration(_) => self.set_storage(i, Field::End, m, INT_CST_MAX),
            IntervalData::FixedDuration(d) => {
                let duration = d.duration;
                self.set_start_min(i, cap_sub(m, duration))
            }
            IntervalData::Fixed(d) => {
                if m > d.start + d.duration {
                    Err(Failure)
                } else {
                    Ok(())
                }
            }
            IntervalData::StartVar(d) => {
                let (v, duration) = (d.start, d.duration);
                self.set_min(v, cap_sub(m, duration)).map(|_| ())
            }
            IntervalData::Mirror(v) => {
                let of = v.of;
                self.set_start_max(of, -m)
            }
            IntervalData::RelaxedMin(_) => {
                panic!("set_end_min is not supported on a relaxed-min interval view")
            }
            IntervalData::RelaxedMax(v) => {
                let of = v.of;
                self.set_end_min(of, m)
            }
            IntervalData::StartSynced(s) => {
                let duration = s.duration;
                self.set_start_min(i, cap_sub(m, duration))
            }
        }
    }

    pub fn set_end_max(&mut self, i: IntervalId, m: IntCst) -> SolverResult<()> {
        match &self.intervals[i] {
            IntervalData::VariableDuration(_) => self.set_storage(i, Field::End, INT_CST_MIN, m),
            IntervalData::FixedDuration(d) => {
                let duration = d.duration;
                self.set_start_max(i, cap_sub(m, duration))
            }
            IntervalData::Fixed(d) => {
                if m < d.start + d.duration {
                    Err(Failure)
                } else {
                    Ok(())
                }
            }
            IntervalData::StartVar(d) => {
                let (v, duration) = (d.start, d.duration);
                self.set_max(v, cap_sub(m, duration)).map(|_| ())
            }
            IntervalData::Mirror(v) => {
                let of = v.of;
                self.set_start_min(of, -m)
            }
            IntervalData::RelaxedMin(v) => {
                let of = v.of;
                self.set_end_max(of, m)
            }
            IntervalData::RelaxedMax(_) => {
                panic!("set_end_max is not supported on a relaxed-max interval view")
            }
            IntervalData::StartSynced(s) => {
                let duration = s.duration;
                self.set_start_max(i, cap_sub(m, duration))
            }
        }
    }

    pub fn set_end_range(&mut self, i: IntervalId, mi: IntCst, ma: IntCst) -> SolverResult<()> {
        match &self.intervals[i] {
            IntervalData::VariableDuration(_) => self.set_storage(i, Field::End, mi, ma),
            IntervalData::Mirror(v) => {
                let of = v.of;
                self.set_start_range(of, -ma, -mi)
            }
            IntervalData::RelaxedMin(v) | IntervalData::RelaxedMax(v) => {
                let of = v.of;
                self.set_end_range(of, mi, ma)
            }
            _ => {
                self.set_end_min(i, mi)?;
                self.set_end_max(i, ma)
            }
        }
    }

    // =========== Demon registration ===========

    pub fn when_start_range(&mut self, i: IntervalId, d: DemonId) {
        match &mut self.intervals[i] {
            IntervalData::FixedDuration(data) => {
                if data.performed.may_be_true() && !data.start.bound() {
                    data.start.range_demons.push(d);
                }
            }
            IntervalData::VariableDuration(data) => {
                if data.performed.may_be_true() && !data.start.bound() {
                    data.start.range_demons.push(d);
                }
            }
            IntervalData::Fixed(_) => {}
            IntervalData::StartVar(data) => {
                let v = data.start;
                self.when_range(v, d);
            }
            IntervalData::Mirror(v) => {
                let of = v.of;
                self.when_end_range(of, d);
            }
            IntervalData::RelaxedMin(v) | IntervalData::RelaxedMax(v) => {
                let of = v.of;
                self.when_start_range(of, d);
            }
            IntervalData::StartSynced(s) => {
                let (of, anchor) = (s.of, s.anchor);
                match anchor {
                    SyncAnchor::Start => self.when_start_range(of, d),
                    SyncAnchor::End => self.when_end_range(of, d),
                }
            }
        }
    }

    pub fn when_start_bound(&mut self, i: IntervalId, d: DemonId) {
        match &mut self.intervals[i] {
            IntervalData::FixedDuration(data) => {
                if data.performed.may_be_true() && !data.start.bound() {
                    data.start.bound_demons.push(d);
                }
            }
            IntervalData::VariableDuration(data) => {
                if data.performed.may_be_true() && !data.start.bound() {
                    data.start.bound_demons.push(d);
                }
            }
            IntervalData::Fixed(_) => {}
            IntervalData::StartVar(data) => {
                let v = data.start;
                self.when_bound(v, d);
            }
            IntervalData::Mirror(v) => {
                let of = v.of;
                self.when_end_bound(of, d);
            }
            IntervalData::RelaxedMin(v) | IntervalData::RelaxedMax(v) => {
                let of = v.of;
                self.when_start_bound(of, d);
            }
            IntervalData::StartSynced(s) => {
                let (of, anchor) = (s.of, s.anchor);
                match anchor {
                    SyncAnchor::Start => self.when_start_bound(of, d),
                    SyncAnchor::End => self.when_end_bound(of, d),
                }
            }
        }
    }

    pub fn when_duration_range(&mut self, i: IntervalId, d: DemonId) {
        match &mut self.intervals[i] {
            IntervalData::VariableDuration(data) => {
                if data.performed.may_be_true() && !data.duration.bound() {
                    data.duration.range_demons.push(d);
                }
            }
            IntervalData::Mirror(v) | IntervalData::RelaxedMin(v) | IntervalData::RelaxedMax(v) => {
                let of = v.of;
                self.when_duration_range(of, d);
            }
            // Fixed-duration variants never see a duration event.
            _ => {}
        }
    }

    pub fn when_duration_bound(&mut self, i: IntervalId, d: DemonId) {
        match &mut self.intervals[i] {
            IntervalData::VariableDuration(data) => {
                if data.performed.may_be_true() && !data.duration.bound() {
                    data.duration.bound_demons.push(d);
                }
            }
            IntervalData::Mirror(v) | IntervalData::RelaxedMin(v) | IntervalData::RelaxedMax(v) => {
                let of = v.of;
                self.when_duration_bound(of, d);
            }
            _ => {}
        }
    }

    pub fn when_end_range(&mut self, i: IntervalId, d: DemonId) {
        match &mut self.intervals[i] {
            IntervalData::VariableDuration(data) => {
                if data.performed.may_be_true() && !data.end.bound() {
                    data.end.range_demons.push(d);
                }
            }
            IntervalData::FixedDuration(_) | IntervalData::StartVar(_) => self.when_start_range(i, d),
            IntervalData::Fixed(_) => {}
            IntervalData::Mirror(v) => {
                let of = v.of;
                self.when_start_range(of, d);
            }
            IntervalData::RelaxedMin(v) | IntervalData::RelaxedMax(v) => {
                let of = v.of;
                self.when_end_range(of, d);
            }
            IntervalData::StartSynced(_) => self.when_start_range(i, d),
        }
    }

    pub fn when_end_bound(&mut self, i: IntervalId, d: DemonId) {
        match &mut self.intervals[i] {
            IntervalData::VariableDuration(data) => {
                if data.performed.may_be_true() && !data.end.bound() {
                    data.end.bound_demons.push(d);
                }
            }
            IntervalData::FixedDuration(_) | IntervalData::StartVar(_) => self.when_start_bound(i, d),
            IntervalData::Fixed(_) => {}
            IntervalData::Mirror(v) => {
                let of = v.of;
                self.when_start_bound(of, d);
            }
            IntervalData::RelaxedMin(v) | IntervalData::RelaxedMax(v) => {
                let of = v.of;
                self.when_end_bound(of, d);
            }
            IntervalData::StartSynced(_) => self.when_start_bound(i, d),
        }
    }

    pub fn when_performed_bound(&mut self, i: IntervalId, d: DemonId) {
        match &mut self.intervals[i] {
            IntervalData::FixedDuration(data) => {
                if !data.performed.bound() {
                    data.performed.demons.push(d);
                }
            }
            IntervalData::VariableDuration(data) => {
                if !data.performed.bound() {
                    data.performed.demons.push(d);
                }
            }
            IntervalData::Fixed(_) | IntervalData::StartVar(_) => {}
            IntervalData::Mirror(v) | IntervalData::RelaxedMin(v) | IntervalData::RelaxedMax(v) => {
                let of = v.of;
                self.when_performed_bound(of, d);
            }
            IntervalData::StartSynced(s) => {
                let of = s.of;
                self.when_performed_bound(of, d);
            }
        }
    }

    pub fn when_anything(&mut self, i: IntervalId, d: DemonId) {
        self.when_start_range(i, d);
        self.when_duration_range(i, d);
        self.when_end_range(i, d);
        self.when_performed_bound(i, d);
    }

    // =========== Storage plumbing ===========

    fn set_storage(&mut self, i: IntervalId, field: Field, mi: IntCst, ma: IntCst) -> SolverResult<()> {
        if !self.may_be_performed(i) {
            return Ok(());
        }
        if self.intervals[i].in_process() {
            if !self.storage_tighten_postponed(i, field, mi, ma) {
                self.set_performed(i, false)?;
            }
            Ok(())
        } else {
            match self.storage_apply(i, field, mi, ma) {
                Outcome::NoOp => Ok(()),
                Outcome::Inconsistent => self.set_performed(i, false),
                Outcome::Push => self.push_interval(i),
            }
        }
    }

    /// Raw intersection of a storage with `[mi, ma]`, trailing the
    /// modified bounds. Does not enqueue anything.
    fn storage_apply(&mut self, i: IntervalId, field: Field, mi: IntCst, ma: IntCst) -> Outcome {
        let st = self.intervals[i].storage_mut(field);
        if mi > st.max || ma < st.min {
            return Outcome::Inconsistent;
        }
        if mi <= st.min && ma >= st.max {
            return Outcome::NoOp;
        }
        st.sync_previous();
        let mut changed_min = None;
        let mut changed_max = None;
        if mi > st.min {
            changed_min = Some(st.min);
            st.min = mi;
        }
        if ma < st.max {
            changed_max = Some(st.max);
            st.max = ma;
        }
        if let Some(prev) = changed_min {
            self.trail.push(UndoEvent::IntervalMin { interval: i, field, prev });
        }
        if let Some(prev) = changed_max {
            self.trail.push(UndoEvent::IntervalMax { interval: i, field, prev });
        }
        Outcome::Push
    }

    /// Tightens the postponed bounds of a storage while its interval is in
    /// process. Returns false if the result would be empty.
    fn storage_tighten_postponed(&mut self, i: IntervalId, field: Field, mi: IntCst, ma: IntCst) -> bool {
        let st = self.intervals[i].storage_mut(field);
        if mi > st.postponed_max || ma < st.postponed_min {
            return false;
        }
        if mi > st.postponed_min {
            st.postponed_min = mi;
        }
        if ma < st.postponed_max {
            st.postponed_max = ma;
        }
        true
    }

    /// Makes the interval consistent and enqueues its handler.
    ///
    /// For a variable-duration interval this is the push step enforcing
    /// `start + duration = end`: each storage is intersected with the
    /// combination of the two others, with saturating arithmetic.
    fn push_interval(&mut self, i: IntervalId) -> SolverResult<()> {
        if matches!(self.intervals[i], IntervalData::VariableDuration(_)) && self.may_be_performed(i) {
            let (_, _, dmin, dmax, emin, emax) = self.vd_bounds(i);
            if self.storage_apply(i, Field::Start, cap_sub(emin, dmax), cap_sub(emax, dmin))
                == Outcome::Inconsistent
            {
                self.performed_set_raw(i, false)?;
            } else {
                let (smin, smax, _, _, emin, emax) = self.vd_bounds(i);
                if self.storage_apply(i, Field::Duration, cap_sub(emin, smax), cap_sub(emax, smin))
                    == Outcome::Inconsistent
                {
                    self.performed_set_raw(i, false)?;
                } else {
                    let (smin, smax, dmin, dmax, _, _) = self.vd_bounds(i);
                    if self.storage_apply(i, Field::End, cap_add(smin, dmin), cap_add(smax, dmax))
                        == Outcome::Inconsistent
                    {
                        self.performed_set_raw(i, false)?;
                    }
                }
            }
        }
        self.enqueue_interval_handler(i);
        Ok(())
    }

    #[allow(clippy::type_complexity)]
    fn vd_bounds(&self, i: IntervalId) -> (IntCst, IntCst, IntCst, IntCst, IntCst, IntCst) {
        match &self.intervals[i] {
            IntervalData::VariableDuration(d) => (
                d.start.min,
                d.start.max,
                d.duration.min,
                d.duration.max,
                d.end.min,
                d.end.max,
            ),
            _ => unreachable!(),
        }
    }

    fn enqueue_interval_handler(&mut self, i: IntervalId) {
        let (in_process, enqueued) = match &self.intervals[i] {
            IntervalData::FixedDuration(d) => (d.in_process, d.enqueued),
            IntervalData::VariableDuration(d) => (d.in_process, d.enqueued),
            _ => unreachable!("only concrete intervals own a handler"),
        };
        debug_assert!(!in_process);
        if !enqueued {
            match &mut self.intervals[i] {
                IntervalData::FixedDuration(d) => d.enqueued = true,
                IntervalData::VariableDuration(d) => d.enqueued = true,
                _ => unreachable!(),
            }
            self.queue.push_handler(Entity::Interval(i));
        }
    }

    // =========== Process step ===========

    pub(crate) fn begin_interval_process(&mut self, i: IntervalId) -> FiredDemons {
        let mut fired: Vec<DemonId> = Vec::new();
        match &mut self.intervals[i] {
            IntervalData::FixedDuration(d) => {
                debug_assert!(!d.in_process);
                d.in_process = true;
                d.enqueued = false;
                d.start.postponed_min = d.start.min;
                d.start.postponed_max = d.start.max;
                d.performed.postponed = d.performed.status;
                if d.performed.may_be_true() {
                    if d.start.bound() {
                        fired.extend_from_slice(&d.start.bound_demons);
                    }
                    if d.start.changed() {
                        fired.extend_from_slice(&d.start.range_demons);
                    }
                }
                if d.performed.previous != d.performed.status {
                    fired.extend_from_slice(&d.performed.demons);
                }
            }
            IntervalData::VariableDuration(d) => {
                debug_assert!(!d.in_process);
                d.in_process = true;
                d.enqueued = false;
                for st in [&mut d.start, &mut d.duration, &mut d.end] {
                    st.postponed_min = st.min;
                    st.postponed_max = st.max;
                }
                d.performed.postponed = d.performed.status;
                if d.performed.may_be_true() {
                    for st in [&d.start, &d.duration, &d.end] {
                        if st.bound() {
                            fired.extend_from_slice(&st.bound_demons);
                        }
                        if st.changed() {
                            fired.extend_from_slice(&st.range_demons);
                        }
                    }
                }
                if d.performed.previous != d.performed.status {
                    fired.extend_from_slice(&d.performed.demons);
                }
            }
            _ => unreachable!("only concrete intervals are processed"),
        }
        self.queue.set_in_process(Entity::Interval(i));
        self.split_by_priority(fired)
    }

    pub(crate) fn end_interval_process(&mut self, i: IntervalId) -> SolverResult<()> {
        // Record previous bounds, then replay any postponed tightening
        // through the public setters so it follows the regular protocol.
        let mut postponed: Vec<(Field, IntCst, IntCst)> = Vec::new();
        let mut postponed_status = None;
        match &mut self.intervals[i] {
            IntervalData::FixedDuration(d) => {
                d.in_process = false;
                d.start.previous_min = d.start.min;
                d.start.previous_max = d.start.max;
                if d.start.postponed_min > d.start.min || d.start.postponed_max < d.start.max {
                    postponed.push((Field::Start, d.start.postponed_min, d.start.postponed_max));
                }
                d.performed.previous = d.performed.status;
                if d.performed.postponed != d.performed.status {
                    postponed_status = Some(d.performed.postponed);
                }
            }
            IntervalData::VariableDuration(d) => {
                d.in_process = false;
                for (field, st) in [
                    (Field::Start, &mut d.start),
                    (Field::Duration, &mut d.duration),
                    (Field::End, &mut d.end),
                ] {
                    st.previous_min = st.min;
                    st.previous_max = st.max;
                    if st.postponed_min > st.min || st.postponed_max < st.max {
                        postponed.push((field, st.postponed_min, st.postponed_max));
                    }
                }
                d.performed.previous = d.performed.status;
                if d.performed.postponed != d.performed.status {
                    postponed_status = Some(d.performed.postponed);
                }
            }
            _ => unreachable!(),
        }
        self.queue.clear_in_process();
        for (field, mi, ma) in postponed {
            match field {
                Field::Start => self.set_start_range(i, mi, ma)?,
                Field::Duration => self.set_duration_range(i, mi, ma)?,
                Field::End => self.set_end_range(i, mi, ma)?,
            }
        }
        if let Some(status) = postponed_status {
            debug_assert!(status != BoolStatus::Undecided);
            self.set_performed(i, status == BoolStatus::True)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::state::State;

    #[test]
    fn test_variable_duration_initial_intersection() {
        let mut s = State::new();
        let i = s.new_variable_duration_interval(0, 10, 3, 5, 0, 12, false, "i");
        assert_eq!(s.start_min(i), 0);
        assert_eq!(s.start_max(i), 9);
        assert_eq!(s.duration_min(i), 3);
        assert_eq!(s.duration_max(i), 5);
        assert_eq!(s.end_min(i), 3);
        assert_eq!(s.end_max(i), 12);
    }

    #[test]
    fn test_optional_interval_never_fails_while_undecided() {
        let mut s = State::new();
        let i = s.new_fixed_duration_interval(0, 10, 4, true, "opt");
        assert!(s.may_be_performed(i));
        assert!(!s.must_be_performed(i));
        // Emptying the start range silently makes the interval unperformed.
        assert_eq!(s.set_start_min(i, 100), Ok(()));
        assert!(!s.may_be_performed(i));
        // Further setters are silent no-ops.
        assert_eq!(s.set_start_max(i, -100), Ok(()));
        // Requiring it now is a contradiction.
        assert_eq!(s.set_performed(i, true), Err(Failure));
    }

    #[test]
    fn test_required_interval_fails() {
        let mut s = State::new();
        let i = s.new_fixed_duration_interval(0, 10, 4, false, "req");
        assert!(s.must_be_performed(i));
        assert_eq!(s.set_start_min(i, 100), Err(Failure));
    }

    #[test]
    fn test_mirror_view() {
        let mut s = State::new();
        let i = s.new_fixed_duration_interval(2, 6, 3, false, "i");
        let m = s.new_mirror_interval(i);
        assert_eq!(s.start_min(m), -s.end_max(i));
        assert_eq!(s.end_max(m), -s.start_min(i));
        assert_eq!(s.duration_min(m), 3);
        // Tightening the mirror tightens the underlying interval.
        s.set_start_min(m, -8).unwrap();
        assert_eq!(s.end_max(i), 8);
        assert_eq!(s.start_max(i), 5);
    }

    #[test]
    fn test_relaxed_views() {
        let mut s = State::new();
        let i = s.new_fixed_duration_interval(2, 6, 3, true, "opt");
        let rmin = s.new_relaxed_min_interval(i);
        let rmax = s.new_relaxed_max_interval(i);
        // Optional underlying: min side relaxed on rmin, max side on rmax.
        assert_eq!(s.start_min(rmin), MIN_VALID_VALUE);
        assert_eq!(s.start_max(rmin), 6);
        assert_eq!(s.start_min(rmax), 2);
        assert_eq!(s.start_max(rmax), cap_sub(MAX_VALID_VALUE, 3));
        assert_eq!(s.end_max(rmax), MAX_VALID_VALUE);
        // Once the underlying must be performed, the views are transparent.
        s.set_performed(i, true).unwrap();
        assert_eq!(s.start_min(rmin), 2);
        assert_eq!(s.start_max(rmax), 6);
    }

    #[test]
    #[should_panic(expected = "not supported on a relaxed-max")]
    fn test_relaxed_max_setter_panics() {
        let mut s = State::new();
        let i = s.new_fixed_duration_interval(2, 6, 3, true, "opt");
        let rmax = s.new_relaxed_max_interval(i);
        let _ = s.set_start_max(rmax, 4);
    }

    #[test]
    fn test_synced_views() {
        let mut s = State::new();
        let i = s.new_fixed_duration_interval(0, 10, 4, false, "i");
        let on_start = s.new_synced_interval(i, SyncAnchor::Start, 2, 1);
        let on_end = s.new_synced_interval(i, SyncAnchor::End, 2, 1);
        assert_eq!(s.start_min(on_start), 1);
        assert_eq!(s.start_max(on_start), 11);
        assert_eq!(s.end_min(on_start), 3);
        assert_eq!(s.start_min(on_end), 5);
        s.set_start_max(on_start, 6).unwrap();
        assert_eq!(s.start_max(i), 5);
    }

    #[test]
    fn test_fixed_interval_contradiction() {
        let mut s = State::new();
        let i = s.new_fixed_interval(3, 2, "fixed");
        assert_eq!(s.start_min(i), 3);
        assert_eq!(s.end_max(i), 5);
        assert_eq!(s.set_start_min(i, 3), Ok(()));
        assert_eq!(s.set_start_min(i, 4), Err(Failure));
        assert_eq!(s.set_performed(i, false), Err(Failure));
    }
}
