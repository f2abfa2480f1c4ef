use crate::core::{BitSetId, CellId, DemonId, IntCst, IntervalId, SequenceId, SwitchId, VarRef};
use crate::sched::interval::{BoolStatus, Field};

/// An undoable change to the engine state, recorded on the trail.
///
/// Each variant carries the previous value of the touched location so that
/// popping the event restores it exactly.
#[derive(Copy, Clone, Debug)]
pub enum UndoEvent {
    VarMin { var: VarRef, prev: IntCst },
    VarMax { var: VarRef, prev: IntCst },
    IntervalMin { interval: IntervalId, field: Field, prev: IntCst },
    IntervalMax { interval: IntervalId, field: Field, prev: IntCst },
    Performed { interval: IntervalId, prev: BoolStatus },
    Cell { cell: CellId, prev: IntCst },
    /// A one-shot switch was turned on; undoing resets it.
    Switch { switch: SwitchId },
    BitSet { set: BitSetId, index: usize },
    BitCleared { set: BitSetId, index: usize },
    Inhibited { demon: DemonId, prev: bool },
    /// The ranked prefix of a sequence grew; undoing truncates it back.
    SequenceRanked { seq: SequenceId, prev_len: usize },
}
