//! The propagator library.
//!
//! A constraint owns demons: [`Constraint::post`] allocates them and
//! attaches them to variable events, [`Constraint::initial_propagate`]
//! seeds the pruning, and [`Constraint::run`] is invoked by the solver
//! whenever one of the constraint's demons is executed, with the tag the
//! demon was registered with (typically the index of the touched
//! variable).

pub mod basic;
pub mod bool_array;
pub mod cumulative;
pub mod diffn;
pub mod min_max;
pub mod scal_prod;
pub mod sum;

use crate::core::state::{DemonPriority, State};
use crate::core::{ConstraintId, DemonId, SolverResult};

pub trait Constraint {
    fn name(&self) -> String;

    /// Registers the constraint's demons on the variables it watches.
    fn post(&mut self, ctx: &mut PostCtx);

    /// Seeds propagation from the current domains.
    fn initial_propagate(&mut self, state: &mut State) -> SolverResult<()>;

    /// Reacts to one of this constraint's demons, identified by its tag.
    fn run(&mut self, state: &mut State, tag: u32) -> SolverResult<()>;
}

/// Context handed to [`Constraint::post`]: gives access to the state for
/// demon registration and collects constraints to be added afterwards
/// (redundant constraints created while posting).
pub struct PostCtx<'a> {
    pub state: &'a mut State,
    constraint: ConstraintId,
    deferred: &'a mut Vec<Box<dyn Constraint>>,
}

impl<'a> PostCtx<'a> {
    pub(crate) fn new(
        state: &'a mut State,
        constraint: ConstraintId,
        deferred: &'a mut Vec<Box<dyn Constraint>>,
    ) -> Self {
        PostCtx {
            state,
            constraint,
            deferred,
        }
    }

    /// Allocates a demon of this constraint.
    pub fn demon(&mut self, tag: u32, priority: DemonPriority) -> DemonId {
        self.state.new_demon(self.constraint, tag, priority)
    }

    /// Schedules a redundant constraint to be posted once this one is.
    pub fn add_constraint(&mut self, c: Box<dyn Constraint>) {
        self.deferred.push(c);
    }
}
