use crate::core::{DemonId, IntervalId, VarRef};
use std::collections::VecDeque;

/// Priority of a demon in the propagation queue.
///
/// `Var` is reserved for the handlers of the variables themselves, which
/// always run before any constraint demon. Constraint demons are either
/// `Normal` (drained in FIFO order) or `Delayed` (one executed only when
/// no normal demon remains).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DemonPriority {
    Var,
    Normal,
    Delayed,
}

/// A propagation object that owns a var-priority handler.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Entity {
    Var(VarRef),
    Interval(IntervalId),
}

/// The next item the solver should process.
#[derive(Copy, Clone, Debug)]
pub enum QueueItem {
    Handler(Entity),
    Demon(DemonId),
}

const MAX_FREEZE_DEPTH: u32 = 1 << 20;

/// Two-level FIFO of demons plus the front queue of variable handlers.
#[derive(Default)]
pub struct Queue {
    handlers: VecDeque<Entity>,
    normal: VecDeque<DemonId>,
    delayed: VecDeque<DemonId>,
    freeze_level: u32,
    /// The entity whose handler is currently consuming its demons, if any.
    /// Cleared through [`Queue::take_in_process`] when a failure unwinds.
    in_process: Option<Entity>,
}

impl Queue {
    pub fn push_handler(&mut self, e: Entity) {
        self.handlers.push_back(e);
    }

    pub fn push_normal(&mut self, d: DemonId) {
        self.normal.push_back(d);
    }

    pub fn push_delayed(&mut self, d: DemonId) {
        self.delayed.push_back(d);
    }

    /// Pops the next item to execute: pending variable handlers first, then
    /// normal demons, and a single delayed demon only once both are empty.
    pub fn pop(&mut self) -> Option<QueueItem> {
        if let Some(e) = self.handlers.pop_front() {
            return Some(QueueItem::Handler(e));
        }
        if let Some(d) = self.normal.pop_front() {
            return Some(QueueItem::Demon(d));
        }
        self.delayed.pop_front().map(QueueItem::Demon)
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty() && self.normal.is_empty() && self.delayed.is_empty()
    }

    pub fn frozen(&self) -> bool {
        self.freeze_level > 0
    }

    pub fn freeze(&mut self) {
        assert!(
            self.freeze_level < MAX_FREEZE_DEPTH,
            "Propagation queue freeze level overflow"
        );
        self.freeze_level += 1;
    }

    /// Returns true if the queue just became unfrozen and must be drained.
    pub fn unfreeze(&mut self) -> bool {
        assert!(self.freeze_level > 0, "Unfreezing a queue that is not frozen");
        self.freeze_level -= 1;
        self.freeze_level == 0
    }

    pub fn set_in_process(&mut self, e: Entity) {
        debug_assert!(self.in_process.is_none());
        self.in_process = Some(e);
    }

    pub fn clear_in_process(&mut self) {
        self.in_process = None;
    }

    pub fn take_in_process(&mut self) -> Option<Entity> {
        self.in_process.take()
    }

    /// Empties the queue, returning everything that was pending so the
    /// caller can reset the corresponding enqueued flags.
    pub fn drain_all(&mut self) -> (Vec<Entity>, Vec<DemonId>) {
        let entities = self.handlers.drain(..).collect();
        let mut demons: Vec<DemonId> = self.normal.drain(..).collect();
        demons.extend(self.delayed.drain(..));
        (entities, demons)
    }
}
