/// A trail of events, each representing an undoable change to some
/// data structure, together with the save points on which one may
/// backtrack.
///
/// Events are only recorded once at least one state has been saved:
/// before that there is nothing to restore and maintaining the log would
/// be wasted work.
#[derive(Clone)]
pub struct Trail<Event> {
    trail: Vec<Event>,
    saved_states: Vec<usize>,
}

impl<Event> Trail<Event> {
    pub fn new() -> Self {
        Trail {
            trail: Vec::new(),
            saved_states: Vec::new(),
        }
    }

    pub fn with_capacity(cap: usize) -> Self {
        Trail {
            trail: Vec::with_capacity(cap),
            saved_states: Vec::new(),
        }
    }

    /// Records a single event. O(1).
    pub fn push(&mut self, e: Event) {
        if !self.saved_states.is_empty() {
            self.trail.push(e);
        }
    }

    pub fn num_events(&self) -> usize {
        self.trail.len()
    }

    pub fn save_state(&mut self) -> u32 {
        self.saved_states.push(self.trail.len());
        self.saved_states.len() as u32 - 1
    }

    pub fn num_saved(&self) -> u32 {
        self.saved_states.len() as u32
    }

    /// Pops all events recorded since the last save point, invoking `f` on
    /// each in reverse chronological order.
    pub fn restore_last_with(&mut self, mut f: impl FnMut(Event)) {
        let last_index = self.saved_states.pop().expect("No saved state");
        while self.trail.len() > last_index {
            let ev = self.trail.pop().expect("No event left");
            f(ev);
        }
    }

    /// Pops save points until `saved_state` save points remain, undoing
    /// every event recorded after them.
    pub fn restore_with(&mut self, saved_state: u32, mut f: impl FnMut(Event)) {
        while self.num_saved() > saved_state {
            self.restore_last_with(&mut f);
        }
    }
}

impl<Event> Default for Trail<Event> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_recording_without_save_point() {
        let mut trail: Trail<i64> = Trail::new();
        trail.push(1);
        trail.push(2);
        assert_eq!(trail.num_events(), 0);
        trail.save_state();
        trail.push(3);
        assert_eq!(trail.num_events(), 1);
    }

    #[test]
    fn test_restore_order() {
        let mut trail: Trail<i64> = Trail::new();
        let lvl = trail.save_state();
        trail.push(1);
        trail.push(2);
        trail.save_state();
        trail.push(3);

        let mut undone = Vec::new();
        trail.restore_with(lvl, |e| undone.push(e));
        assert_eq!(undone, vec![3, 2, 1]);
        assert_eq!(trail.num_events(), 0);
        assert_eq!(trail.num_saved(), 0);
    }
}
