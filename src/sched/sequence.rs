//! Sequence variables: an ordered collection of interval variables with a
//! reversible ranked prefix.

use crate::core::state::{State, UndoEvent};
use crate::core::{IntervalId, SequenceId, SolverResult};

pub(crate) struct SequenceData {
    pub intervals: Vec<IntervalId>,
    /// Positions ranked so far, in order. Its length is reversible.
    pub ranked: Vec<i32>,
    pub name: String,
}

impl State {
    pub fn new_sequence(&mut self, intervals: Vec<IntervalId>, name: impl Into<String>) -> SequenceId {
        self.sequences.push(SequenceData {
            intervals,
            ranked: Vec::new(),
            name: name.into(),
        })
    }

    pub fn sequence_name(&self, s: SequenceId) -> &str {
        &self.sequences[s].name
    }

    pub fn sequence_intervals(&self, s: SequenceId) -> &[IntervalId] {
        &self.sequences[s].intervals
    }

    /// Current ranking: the ranked prefix followed by the still-unranked
    /// positions in index order.
    pub fn fill_sequence(&self, s: SequenceId) -> Vec<i32> {
        let data = &self.sequences[s];
        let mut out = data.ranked.clone();
        for pos in 0..data.intervals.len() as i32 {
            if !data.ranked.contains(&pos) {
                out.push(pos);
            }
        }
        out
    }

    /// Asserts that position `pos` is performed next: the corresponding
    /// interval is required, is pushed after the previously ranked one,
    /// and joins the ranked prefix.
    ///
    /// # Panics
    /// Panics if `pos` is out of range or already ranked.
    pub fn rank_first(&mut self, s: SequenceId, pos: i32) -> SolverResult<()> {
        let data = &self.sequences[s];
        assert!(
            (pos as usize) < data.intervals.len(),
            "rank_first: position {pos} out of range"
        );
        assert!(!data.ranked.contains(&pos), "rank_first: position {pos} already ranked");
        let interval = data.intervals[pos as usize];
        let predecessor = data.ranked.last().map(|&p| data.intervals[p as usize]);
        let prev_len = data.ranked.len();

        self.set_performed(interval, true)?;
        if let Some(prev) = predecessor {
            let horizon = self.end_min(prev);
            self.set_start_min(interval, horizon)?;
        }
        self.trail.push(UndoEvent::SequenceRanked { seq: s, prev_len });
        self.sequences[s].ranked.push(pos);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::backtrack::Backtrack;
    use crate::core::state::State;

    #[test]
    fn test_rank_first_orders_intervals() {
        let mut s = State::new();
        let a = s.new_fixed_duration_interval(0, 10, 3, false, "a");
        let b = s.new_fixed_duration_interval(0, 10, 2, false, "b");
        let seq = s.new_sequence(vec![a, b], "seq");
        assert_eq!(s.fill_sequence(seq), vec![0, 1]);

        s.rank_first(seq, 1).unwrap();
        s.rank_first(seq, 0).unwrap();
        assert_eq!(s.fill_sequence(seq), vec![1, 0]);
        // a is pushed after the end of b
        assert_eq!(s.start_min(a), 2);
    }

    #[test]
    fn test_ranking_is_reversible() {
        let mut s = State::new();
        let a = s.new_fixed_duration_interval(0, 10, 3, false, "a");
        let b = s.new_fixed_duration_interval(0, 10, 2, false, "b");
        let seq = s.new_sequence(vec![a, b], "seq");
        let lvl = s.save_state();
        s.rank_first(seq, 0).unwrap();
        assert_eq!(s.fill_sequence(seq), vec![0, 1]);
        s.restore(lvl);
        assert_eq!(s.fill_sequence(seq), vec![0, 1]);
        assert!(s.sequences[seq].ranked.is_empty());
    }
}
