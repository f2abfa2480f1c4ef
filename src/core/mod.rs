pub mod num;
pub mod state;

use crate::create_ref_type;

pub use num::{cap_add, cap_sub};

/// Type of every bound manipulated by the engine.
pub type IntCst = i64;

/// Absorbing sentinel for an effectively unbounded lower bound.
pub const INT_CST_MIN: IntCst = IntCst::MIN;
/// Absorbing sentinel for an effectively unbounded upper bound.
pub const INT_CST_MAX: IntCst = IntCst::MAX;

/// Largest value an interval bound may take.
///
/// The valid range is symmetric around zero so that mirroring an interval
/// is exact, and leaves enough headroom below the saturation sentinels for
/// sums of a few bounds not to overflow.
pub const MAX_VALID_VALUE: IntCst = INT_CST_MAX >> 2;
/// Smallest value an interval bound may take.
pub const MIN_VALID_VALUE: IntCst = -MAX_VALID_VALUE;

create_ref_type!(VarRef);
create_ref_type!(IntervalId);
create_ref_type!(SequenceId);
create_ref_type!(ConstraintId);
create_ref_type!(DemonId);
create_ref_type!(CellId);
create_ref_type!(SwitchId);
create_ref_type!(BitSetId);

/// A contradiction detected by a setter or a propagator.
///
/// Carries no payload: it is the control-flow signal that unwinds, through
/// `?`, to the nearest search choice point where the state is restored.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Failure;

pub type SolverResult<T> = Result<T, Failure>;
