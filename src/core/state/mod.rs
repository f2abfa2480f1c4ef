mod event;
mod queue;
mod var;

pub use event::UndoEvent;
pub use queue::{DemonPriority, Entity, Queue, QueueItem};
pub(crate) use var::FiredDemons;

use crate::backtrack::{Backtrack, Trail};
use crate::collections::RefVec;
use crate::core::{BitSetId, CellId, ConstraintId, DemonId, IntCst, SwitchId};
use crate::core::{IntervalId, SequenceId, VarRef};
use crate::sched::interval::IntervalData;
use crate::sched::sequence::SequenceData;
use var::IntVarData;

/// A demon: a constraint callback identified by an interpretation tag,
/// scheduled at a fixed priority. Inhibition is reversible.
struct DemonData {
    constraint: ConstraintId,
    tag: u32,
    priority: DemonPriority,
    inhibited: bool,
    enqueued: bool,
}

struct BitSetData {
    words: Vec<u64>,
    cardinality: u64,
}

/// The complete propagation state of a solver: every reversible location
/// (variable bounds, interval storages, generic cells, switches, bit-sets,
/// demon inhibition), the trail that records their previous values, the
/// demon arena and the propagation queue.
///
/// **Invariant:** every domain is non-empty; any update that would empty
/// one returns `Err(Failure)` without being applied.
pub struct State {
    pub(crate) trail: Trail<UndoEvent>,
    pub(crate) vars: RefVec<VarRef, IntVarData>,
    pub(crate) intervals: RefVec<IntervalId, IntervalData>,
    pub(crate) sequences: RefVec<SequenceId, SequenceData>,
    cells: RefVec<CellId, IntCst>,
    switches: RefVec<SwitchId, bool>,
    bitsets: RefVec<BitSetId, BitSetData>,
    demons: RefVec<DemonId, DemonData>,
    pub(crate) queue: Queue,
}

impl State {
    pub fn new() -> State {
        Self::with_trail_capacity(64)
    }

    pub fn with_trail_capacity(cap: usize) -> State {
        State {
            trail: Trail::with_capacity(cap),
            vars: Default::default(),
            intervals: Default::default(),
            sequences: Default::default(),
            cells: Default::default(),
            switches: Default::default(),
            bitsets: Default::default(),
            demons: Default::default(),
            queue: Default::default(),
        }
    }

    // =========== Reversible cells ===========

    pub fn new_cell(&mut self, value: IntCst) -> CellId {
        self.cells.push(value)
    }

    pub fn cell(&self, c: CellId) -> IntCst {
        self.cells[c]
    }

    pub fn set_cell(&mut self, c: CellId, value: IntCst) {
        let prev = self.cells[c];
        if prev != value {
            self.trail.push(UndoEvent::Cell { cell: c, prev });
            self.cells[c] = value;
        }
    }

    pub fn add_cell(&mut self, c: CellId, delta: IntCst) {
        let prev = self.cells[c];
        self.set_cell(c, prev + delta);
    }

    // =========== One-shot switches ===========

    pub fn new_switch(&mut self) -> SwitchId {
        self.switches.push(false)
    }

    pub fn switched(&self, s: SwitchId) -> bool {
        self.switches[s]
    }

    pub fn switch_on(&mut self, s: SwitchId) {
        if !self.switches[s] {
            self.trail.push(UndoEvent::Switch { switch: s });
            self.switches[s] = true;
        }
    }

    // =========== Reversible bit-sets ===========

    pub fn new_bitset(&mut self, size: usize) -> BitSetId {
        self.bitsets.push(BitSetData {
            words: vec![0; size.div_ceil(64)],
            cardinality: 0,
        })
    }

    pub fn bit(&self, b: BitSetId, index: usize) -> bool {
        let set = &self.bitsets[b];
        set.words[index / 64] & (1u64 << (index % 64)) != 0
    }

    pub fn set_bit_to_one(&mut self, b: BitSetId, index: usize) {
        if !self.bit(b, index) {
            let set = &mut self.bitsets[b];
            set.words[index / 64] |= 1u64 << (index % 64);
            set.cardinality += 1;
            self.trail.push(UndoEvent::BitSet { set: b, index });
        }
    }

    pub fn set_bit_to_zero(&mut self, b: BitSetId, index: usize) {
        if self.bit(b, index) {
            let set = &mut self.bitsets[b];
            set.words[index / 64] &= !(1u64 << (index % 64));
            set.cardinality -= 1;
            self.trail.push(UndoEvent::BitCleared { set: b, index });
        }
    }

    pub fn cardinality(&self, b: BitSetId) -> u64 {
        self.bitsets[b].cardinality
    }

    pub fn is_cardinality_zero(&self, b: BitSetId) -> bool {
        self.bitsets[b].cardinality == 0
    }

    pub fn is_cardinality_one(&self, b: BitSetId) -> bool {
        self.bitsets[b].cardinality == 1
    }

    /// Index of the first set bit at or after `start`, if any.
    pub fn first_bit(&self, b: BitSetId, start: usize) -> Option<usize> {
        let set = &self.bitsets[b];
        let num_bits = set.words.len() * 64;
        (start..num_bits).find(|&i| self.bit(b, i))
    }

    // =========== Demons ===========

    pub fn new_demon(&mut self, constraint: ConstraintId, tag: u32, priority: DemonPriority) -> DemonId {
        debug_assert!(priority != DemonPriority::Var, "Var priority is reserved for variable handlers");
        self.demons.push(DemonData {
            constraint,
            tag,
            priority,
            inhibited: false,
            enqueued: false,
        })
    }

    pub fn demon_is_delayed(&self, d: DemonId) -> bool {
        self.demons[d].priority == DemonPriority::Delayed
    }

    pub fn demon_inhibited(&self, d: DemonId) -> bool {
        self.demons[d].inhibited
    }

    /// Reversibly prevents `d` from executing until re-enabled.
    pub fn inhibit(&mut self, d: DemonId) {
        if !self.demons[d].inhibited {
            self.trail.push(UndoEvent::Inhibited { demon: d, prev: false });
            self.demons[d].inhibited = true;
        }
    }

    pub fn desinhibit(&mut self, d: DemonId) {
        if self.demons[d].inhibited {
            self.trail.push(UndoEvent::Inhibited { demon: d, prev: true });
            self.demons[d].inhibited = false;
        }
    }

    /// Queues `d` at its registered priority. A demon already queued is
    /// not queued a second time.
    pub fn enqueue_demon(&mut self, d: DemonId) {
        let data = &mut self.demons[d];
        if data.enqueued {
            return;
        }
        data.enqueued = true;
        match data.priority {
            DemonPriority::Normal => self.queue.push_normal(d),
            DemonPriority::Delayed => self.queue.push_delayed(d),
            DemonPriority::Var => unreachable!(),
        }
    }

    /// Marks a popped demon as no longer queued and returns its dispatch
    /// information, or `None` if it is currently inhibited.
    pub(crate) fn demon_popped(&mut self, d: DemonId) -> Option<(ConstraintId, u32)> {
        let data = &mut self.demons[d];
        data.enqueued = false;
        if data.inhibited {
            None
        } else {
            Some((data.constraint, data.tag))
        }
    }

    // =========== Queue control ===========

    pub fn queue_frozen(&self) -> bool {
        self.queue.frozen()
    }

    pub fn freeze_queue(&mut self) {
        self.queue.freeze();
    }

    /// Clears all pending propagation after a failure: queues are emptied
    /// and every enqueued/in-process flag is reset so that no demon
    /// observes partially propagated state.
    pub(crate) fn clear_queue_on_fail(&mut self) {
        let (entities, demons) = self.queue.drain_all();
        for e in entities {
            self.clear_enqueued_flag(e);
        }
        for d in demons {
            self.demons[d].enqueued = false;
        }
        if let Some(e) = self.queue.take_in_process() {
            self.clear_in_process_flag(e);
        }
    }

    fn clear_enqueued_flag(&mut self, e: Entity) {
        match e {
            Entity::Var(v) => self.vars[v].enqueued = false,
            Entity::Interval(i) => self.intervals[i].clear_enqueued(),
        }
    }

    pub(crate) fn clear_in_process_flag(&mut self, e: Entity) {
        match e {
            Entity::Var(v) => self.vars[v].in_process = false,
            Entity::Interval(i) => self.intervals[i].clear_in_process(),
        }
    }

    // =========== Undo ===========

    fn undo(&mut self, ev: UndoEvent) {
        match ev {
            UndoEvent::VarMin { var, prev } => self.vars[var].min = prev,
            UndoEvent::VarMax { var, prev } => self.vars[var].max = prev,
            UndoEvent::IntervalMin { interval, field, prev } => {
                self.intervals[interval].undo_min(field, prev)
            }
            UndoEvent::IntervalMax { interval, field, prev } => {
                self.intervals[interval].undo_max(field, prev)
            }
            UndoEvent::Performed { interval, prev } => {
                self.intervals[interval].undo_performed(prev)
            }
            UndoEvent::Cell { cell, prev } => self.cells[cell] = prev,
            UndoEvent::Switch { switch } => self.switches[switch] = false,
            UndoEvent::BitSet { set, index } => {
                let s = &mut self.bitsets[set];
                s.words[index / 64] &= !(1u64 << (index % 64));
                s.cardinality -= 1;
            }
            UndoEvent::BitCleared { set, index } => {
                let s = &mut self.bitsets[set];
                s.words[index / 64] |= 1u64 << (index % 64);
                s.cardinality += 1;
            }
            UndoEvent::Inhibited { demon, prev } => self.demons[demon].inhibited = prev,
            UndoEvent::SequenceRanked { seq, prev_len } => {
                self.sequences[seq].ranked.truncate(prev_len)
            }
        }
    }
}

impl Default for State {
    fn default() -> Self {
        Self::new()
    }
}

impl Backtrack for State {
    fn save_state(&mut self) -> u32 {
        self.trail.save_state()
    }

    fn num_saved(&self) -> u32 {
        self.trail.num_saved()
    }

    fn restore_last(&mut self) {
        // Anything still queued refers to the level being abandoned.
        self.clear_queue_on_fail();
        let mut trail = std::mem::take(&mut self.trail);
        trail.restore_last_with(|ev| self.undo(ev));
        self.trail = trail;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_round_trip() {
        let mut s = State::new();
        let c = s.new_cell(7);
        let lvl = s.save_state();
        s.set_cell(c, 9);
        s.add_cell(c, -4);
        assert_eq!(s.cell(c), 5);
        s.restore(lvl);
        assert_eq!(s.cell(c), 7);
    }

    #[test]
    fn test_switch_round_trip() {
        let mut s = State::new();
        let sw = s.new_switch();
        let lvl = s.save_state();
        assert!(!s.switched(sw));
        s.switch_on(sw);
        s.switch_on(sw);
        assert!(s.switched(sw));
        s.restore(lvl);
        assert!(!s.switched(sw));
    }

    #[test]
    fn test_bitset_cardinality() {
        let mut s = State::new();
        let b = s.new_bitset(100);
        let lvl = s.save_state();
        s.set_bit_to_one(b, 3);
        s.set_bit_to_one(b, 97);
        assert_eq!(s.cardinality(b), 2);
        assert_eq!(s.first_bit(b, 0), Some(3));
        assert_eq!(s.first_bit(b, 4), Some(97));
        s.set_bit_to_zero(b, 3);
        assert!(s.is_cardinality_one(b));
        assert_eq!(s.first_bit(b, 0), Some(97));
        s.restore(lvl);
        assert!(s.is_cardinality_zero(b));
    }
}
