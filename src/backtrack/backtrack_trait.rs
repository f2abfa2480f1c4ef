/// Ability of a structure to save its current state and restore any
/// previously saved one.
///
/// Saved states are identified by the number of states saved before them:
/// the first call to `save_state` returns `0`, the second `1`, and so on.
pub trait Backtrack {
    fn save_state(&mut self) -> u32;

    /// Number of save points currently active.
    fn num_saved(&self) -> u32;

    fn restore_last(&mut self);

    /// Restores the state that was current when `save_state` returned
    /// `saved_id`, undoing all changes recorded since.
    fn restore(&mut self, saved_id: u32) {
        while self.num_saved() > saved_id {
            self.restore_last();
        }
    }

    fn reset(&mut self) {
        if self.num_saved() > 0 {
            self.restore(0);
        }
    }
}
