//! Aggregate constraints over arrays of boolean variables.
//!
//! Booleans are integer variables with domain `[0, 1]`. The aggregators
//! maintain reversible counters of still-unbound inputs plus a one-shot
//! "decided" latch, and inhibit their input demons once the outcome is
//! known.

use crate::constraints::{Constraint, PostCtx};
use crate::core::state::{DemonPriority, State};
use crate::core::{BitSetId, CellId, DemonId, Failure, SolverResult, SwitchId, VarRef};

pub(crate) const TARGET_TAG: u32 = u32::MAX;

/// `and(vars) == target`, i.e. min of an array of booleans.
pub struct ArrayBoolAndEq {
    vars: Vec<VarRef>,
    target: VarRef,
    demons: Vec<Option<DemonId>>,
    unbounded: Option<CellId>,
    decided: Option<SwitchId>,
}

impl ArrayBoolAndEq {
    pub fn new(vars: Vec<VarRef>, target: VarRef) -> Self {
        let n = vars.len();
        ArrayBoolAndEq {
            vars,
            target,
            demons: vec![None; n],
            unbounded: None,
            decided: None,
        }
    }

    fn inhibit_all(&self, state: &mut State) {
        for d in self.demons.iter().flatten() {
            state.inhibit(*d);
        }
    }

    fn find_possible_zero(&self, state: &State) -> Option<usize> {
        (0..self.vars.len()).find(|&i| state.min(self.vars[i]) == 0)
    }

    fn propagate_var(&self, state: &mut State, index: usize) -> SolverResult<()> {
        let unbounded = self.unbounded.unwrap();
        let decided = self.decided.unwrap();
        if state.min(self.vars[index]) == 1 {
            state.add_cell(unbounded, -1);
            if state.cell(unbounded) == 0 && !state.switched(decided) {
                state.set_min(self.target, 1)?;
                state.switch_on(decided);
            }
            if state.max(self.target) == 0 && state.cell(unbounded) == 1 && !state.switched(decided) {
                match self.find_possible_zero(state) {
                    Some(to_set) => {
                        state.set_max(self.vars[to_set], 0)?;
                        state.switch_on(decided);
                    }
                    None => return Err(Failure),
                }
            }
        } else {
            self.inhibit_all(state);
            state.set_max(self.target, 0)?;
        }
        Ok(())
    }

    fn propagate_target(&self, state: &mut State) -> SolverResult<()> {
        if state.min(self.target) == 1 {
            for &v in &self.vars {
                state.set_min(v, 1)?;
            }
        } else {
            let unbounded = self.unbounded.unwrap();
            let decided = self.decided.unwrap();
            if state.cell(unbounded) == 1 && !state.switched(decided) {
                match self.find_possible_zero(state) {
                    Some(to_set) => {
                        state.set_max(self.vars[to_set], 0)?;
                        state.switch_on(decided);
                    }
                    None => return Err(Failure),
                }
            }
        }
        Ok(())
    }
}

impl Constraint for ArrayBoolAndEq {
    fn name(&self) -> String {
        format!("And({} vars) == {:?}", self.vars.len(), self.target)
    }

    fn post(&mut self, ctx: &mut PostCtx) {
        self.unbounded = Some(ctx.state.new_cell(0));
        self.decided = Some(ctx.state.new_switch());
        for (i, &v) in self.vars.iter().enumerate() {
            if !ctx.state.bound(v) {
                let d = ctx.demon(i as u32, DemonPriority::Normal);
                ctx.state.when_bound(v, d);
                self.demons[i] = Some(d);
            }
        }
        let target_demon = ctx.demon(TARGET_TAG, DemonPriority::Normal);
        ctx.state.when_bound(self.target, target_demon);
    }

    fn initial_propagate(&mut self, state: &mut State) -> SolverResult<()> {
        state.set_range(self.target, 0, 1)?;
        if state.min(self.target) == 1 {
            for &v in &self.vars {
                state.set_min(v, 1)?;
            }
        } else {
            let mut zeros = 0;
            let mut unbounded = 0;
            for &v in &self.vars {
                unbounded += i64::from(!state.bound(v));
                zeros += i64::from(state.max(v) == 0);
            }
            if zeros > 0 {
                self.inhibit_all(state);
                state.set_max(self.target, 0)?;
            } else if unbounded == 0 {
                state.set_min(self.target, 1)?;
            } else if state.max(self.target) == 0 && unbounded == 1 {
                let index = self.find_possible_zero(state).expect("an unbound var remains");
                state.set_max(self.vars[index], 0)?;
            } else {
                state.set_cell(self.unbounded.unwrap(), unbounded);
            }
        }
        Ok(())
    }

    fn run(&mut self, state: &mut State, tag: u32) -> SolverResult<()> {
        if tag == TARGET_TAG {
            self.propagate_target(state)
        } else {
            self.propagate_var(state, tag as usize)
        }
    }
}

/// `or(vars) == target`, i.e. max of an array of booleans.
pub struct ArrayBoolOrEq {
    vars: Vec<VarRef>,
    target: VarRef,
    demons: Vec<Option<DemonId>>,
    unbounded: Option<CellId>,
    decided: Option<SwitchId>,
}

impl ArrayBoolOrEq {
    pub fn new(vars: Vec<VarRef>, target: VarRef) -> Self {
        let n = vars.len();
        ArrayBoolOrEq {
            vars,
            target,
            demons: vec![None; n],
            unbounded: None,
            decided: None,
        }
    }

    fn inhibit_all(&self, state: &mut State) {
        for d in self.demons.iter().flatten() {
            state.inhibit(*d);
        }
    }

    fn find_possible_one(&self, state: &State) -> Option<usize> {
        (0..self.vars.len()).find(|&i| state.max(self.vars[i]) == 1)
    }

    fn propagate_var(&self, state: &mut State, index: usize) -> SolverResult<()> {
        let unbounded = self.unbounded.unwrap();
        let decided = self.decided.unwrap();
        if state.min(self.vars[index]) == 0 {
            state.add_cell(unbounded, -1);
            if state.cell(unbounded) == 0 && !state.switched(decided) {
                state.set_max(self.target, 0)?;
                state.switch_on(decided);
            }
            if state.min(self.target) == 1 && state.cell(unbounded) == 1 && !state.switched(decided) {
                match self.find_possible_one(state) {
                    Some(to_set) => {
                        state.set_min(self.vars[to_set], 1)?;
                        state.switch_on(decided);
                    }
                    None => return Err(Failure),
                }
            }
        } else {
            self.inhibit_all(state);
            state.set_min(self.target, 1)?;
        }
        Ok(())
    }

    fn propagate_target(&self, state: &mut State) -> SolverResult<()> {
        if state.max(self.target) == 0 {
            for &v in &self.vars {
                state.set_max(v, 0)?;
            }
        } else {
            let unbounded = self.unbounded.unwrap();
            let decided = self.decided.unwrap();
            if state.cell(unbounded) == 1 && !state.switched(decided) {
                match self.find_possible_one(state) {
                    Some(to_set) => {
                        state.set_min(self.vars[to_set], 1)?;
                        state.switch_on(decided);
                    }
                    None => return Err(Failure),
                }
            }
        }
        Ok(())
    }
}

impl Constraint for ArrayBoolOrEq {
    fn name(&self) -> String {
        format!("Or({} vars) == {:?}", self.vars.len(), self.target)
    }

    fn post(&mut self, ctx: &mut PostCtx) {
        self.unbounded = Some(ctx.state.new_cell(0));
        self.decided = Some(ctx.state.new_switch());
        for (i, &v) in self.vars.iter().enumerate() {
            if !ctx.state.bound(v) {
                let d = ctx.demon(i as u32, DemonPriority::Normal);
                ctx.state.when_bound(v, d);
                self.demons[i] = Some(d);
            }
        }
        let target_demon = ctx.demon(TARGET_TAG, DemonPriority::Normal);
        ctx.state.when_bound(self.target, target_demon);
    }

    fn initial_propagate(&mut self, state: &mut State) -> SolverResult<()> {
        state.set_range(self.target, 0, 1)?;
        if state.max(self.target) == 0 {
            for &v in &self.vars {
                state.set_max(v, 0)?;
            }
        } else {
            let mut ones = 0;
            let mut unbounded = 0;
            for &v in &self.vars {
                unbounded += i64::from(!state.bound(v));
                ones += i64::from(state.min(v) == 1);
            }
            if ones > 0 {
                self.inhibit_all(state);
                state.set_min(self.target, 1)?;
            } else if unbounded == 0 {
                state.set_max(self.target, 0)?;
            } else if state.min(self.target) == 1 && unbounded == 1 {
                let index = self.find_possible_one(state).expect("an unbound var remains");
                state.set_min(self.vars[index], 1)?;
            } else {
                state.set_cell(self.unbounded.unwrap(), unbounded);
            }
        }
        Ok(())
    }

    fn run(&mut self, state: &mut State, tag: u32) -> SolverResult<()> {
        if tag == TARGET_TAG {
            self.propagate_target(state)
        } else {
            self.propagate_var(state, tag as usize)
        }
    }
}

/// `sum(vars) <= 1`: the first input bound to 1 forces all others to 0.
pub struct SumBooleanLessOrEqualToOne {
    vars: Vec<VarRef>,
    inactive: Option<SwitchId>,
}

impl SumBooleanLessOrEqualToOne {
    pub fn new(vars: Vec<VarRef>) -> Self {
        SumBooleanLessOrEqualToOne { vars, inactive: None }
    }

    fn push_all_to_zero_except(&self, state: &mut State, index: usize) -> SolverResult<()> {
        state.switch_on(self.inactive.unwrap());
        for (i, &v) in self.vars.iter().enumerate() {
            if i != index && state.max(v) != 0 {
                state.set_max(v, 0)?;
            }
        }
        Ok(())
    }
}

impl Constraint for SumBooleanLessOrEqualToOne {
    fn name(&self) -> String {
        format!("SumBoolean({} vars) <= 1", self.vars.len())
    }

    fn post(&mut self, ctx: &mut PostCtx) {
        self.inactive = Some(ctx.state.new_switch());
        for (i, &v) in self.vars.iter().enumerate() {
            if !ctx.state.bound(v) {
                let d = ctx.demon(i as u32, DemonPriority::Normal);
                ctx.state.when_bound(v, d);
            }
        }
    }

    fn initial_propagate(&mut self, state: &mut State) -> SolverResult<()> {
        for i in 0..self.vars.len() {
            if state.min(self.vars[i]) == 1 {
                return self.push_all_to_zero_except(state, i);
            }
        }
        Ok(())
    }

    fn run(&mut self, state: &mut State, tag: u32) -> SolverResult<()> {
        let index = tag as usize;
        if !state.switched(self.inactive.unwrap()) {
            debug_assert!(state.bound(self.vars[index]));
            if state.min(self.vars[index]) == 1 {
                self.push_all_to_zero_except(state, index)?;
            }
        }
        Ok(())
    }
}

/// `sum(vars) >= 1`: a reversible bit-set tracks which inputs can still
/// be 1; when a single candidate remains it is forced to 1, and an empty
/// candidate set is a contradiction.
pub struct SumBooleanGreaterOrEqualToOne {
    vars: Vec<VarRef>,
    bits: Option<BitSetId>,
    inactive: Option<SwitchId>,
}

impl SumBooleanGreaterOrEqualToOne {
    pub fn new(vars: Vec<VarRef>) -> Self {
        SumBooleanGreaterOrEqualToOne {
            vars,
            bits: None,
            inactive: None,
        }
    }

    fn check_candidates(&self, state: &mut State) -> SolverResult<()> {
        let bits = self.bits.unwrap();
        if state.is_cardinality_zero(bits) {
            Err(Failure)
        } else if state.is_cardinality_one(bits) {
            let index = state.first_bit(bits, 0).expect("cardinality is one");
            state.set_value(self.vars[index], 1)?;
            state.switch_on(self.inactive.unwrap());
            Ok(())
        } else {
            Ok(())
        }
    }
}

impl Constraint for SumBooleanGreaterOrEqualToOne {
    fn name(&self) -> String {
        format!("SumBoolean({} vars) >= 1", self.vars.len())
    }

    fn post(&mut self, ctx: &mut PostCtx) {
        self.bits = Some(ctx.state.new_bitset(self.vars.len()));
        self.inactive = Some(ctx.state.new_switch());
        for (i, &v) in self.vars.iter().enumerate() {
            let d = ctx.demon(i as u32, DemonPriority::Normal);
            ctx.state.when_range(v, d);
        }
    }

    fn initial_propagate(&mut self, state: &mut State) -> SolverResult<()> {
        let bits = self.bits.unwrap();
        for (i, &v) in self.vars.iter().enumerate() {
            if state.min(v) == 1 {
                state.switch_on(self.inactive.unwrap());
                return Ok(());
            }
            if state.max(v) == 1 {
                state.set_bit_to_one(bits, i);
            }
        }
        self.check_candidates(state)
    }

    fn run(&mut self, state: &mut State, tag: u32) -> SolverResult<()> {
        let index = tag as usize;
        if !state.switched(self.inactive.unwrap()) {
            if state.min(self.vars[index]) == 1 {
                // Bound to 1: the constraint is satisfied.
                state.switch_on(self.inactive.unwrap());
            } else {
                state.set_bit_to_zero(self.bits.unwrap(), index);
                self.check_candidates(state)?;
            }
        }
        Ok(())
    }
}

/// `sum(vars) == 1`.
pub struct SumBooleanEqualToOne {
    vars: Vec<VarRef>,
    active_vars: Option<CellId>,
    inactive: Option<SwitchId>,
}

impl SumBooleanEqualToOne {
    pub fn new(vars: Vec<VarRef>) -> Self {
        SumBooleanEqualToOne {
            vars,
            active_vars: None,
            inactive: None,
        }
    }

    fn push_all_to_zero_except(&self, state: &mut State, index: usize) -> SolverResult<()> {
        state.switch_on(self.inactive.unwrap());
        for (i, &v) in self.vars.iter().enumerate() {
            if i != index && state.max(v) != 0 {
                state.set_max(v, 0)?;
            }
        }
        Ok(())
    }
}

impl Constraint for SumBooleanEqualToOne {
    fn name(&self) -> String {
        format!("SumBoolean({} vars) == 1", self.vars.len())
    }

    fn post(&mut self, ctx: &mut PostCtx) {
        self.active_vars = Some(ctx.state.new_cell(0));
        self.inactive = Some(ctx.state.new_switch());
        for (i, &v) in self.vars.iter().enumerate() {
            let d = ctx.demon(i as u32, DemonPriority::Normal);
            ctx.state.when_bound(v, d);
        }
    }

    fn initial_propagate(&mut self, state: &mut State) -> SolverResult<()> {
        let mut min1 = 0;
        let mut max1 = 0;
        let mut index_min = None;
        let mut index_max = None;
        for (i, &v) in self.vars.iter().enumerate() {
            if state.min(v) == 1 {
                min1 += 1;
                index_min = Some(i);
            }
            if state.max(v) == 1 {
                max1 += 1;
                index_max = Some(i);
            }
        }
        if min1 > 1 || max1 == 0 {
            Err(Failure)
        } else if min1 == 1 {
            self.push_all_to_zero_except(state, index_min.unwrap())
        } else if max1 == 1 {
            state.set_value(self.vars[index_max.unwrap()], 1)?;
            state.switch_on(self.inactive.unwrap());
            Ok(())
        } else {
            state.set_cell(self.active_vars.unwrap(), max1);
            Ok(())
        }
    }

    fn run(&mut self, state: &mut State, tag: u32) -> SolverResult<()> {
        let index = tag as usize;
        if state.switched(self.inactive.unwrap()) {
            return Ok(());
        }
        debug_assert!(state.bound(self.vars[index]));
        let value = state.min(self.vars[index]);
        if value == 0 {
            let active = self.active_vars.unwrap();
            state.add_cell(active, -1);
            debug_assert!(state.cell(active) >= 0);
            if state.cell(active) == 0 {
                return Err(Failure);
            } else if state.cell(active) == 1 {
                for (i, &v) in self.vars.iter().enumerate() {
                    if state.max(v) == 1 {
                        state.set_value(v, 1)?;
                        return self.push_all_to_zero_except(state, i);
                    }
                }
                return Err(Failure);
            }
        } else {
            self.push_all_to_zero_except(state, index)?;
        }
        Ok(())
    }
}

/// `sum(vars) == sum_var`: maintains the number of inputs surely true and
/// possibly true, keeps `sum_var` within them, and freezes the remaining
/// inputs when either extreme is reached.
pub struct SumBooleanEqualToVar {
    vars: Vec<VarRef>,
    sum_var: VarRef,
    num_possible_true: Option<CellId>,
    num_always_true: Option<CellId>,
    inactive: Option<SwitchId>,
}

impl SumBooleanEqualToVar {
    pub fn new(vars: Vec<VarRef>, sum_var: VarRef) -> Self {
        SumBooleanEqualToVar {
            vars,
            sum_var,
            num_possible_true: None,
            num_always_true: None,
            inactive: None,
        }
    }

    fn push_all_unbound_to_zero(&self, state: &mut State) -> SolverResult<()> {
        state.switch_on(self.inactive.unwrap());
        let mut counter = 0;
        for &v in &self.vars {
            if state.min(v) == 0 {
                state.set_value(v, 0)?;
            } else {
                counter += 1;
            }
        }
        if counter < state.min(self.sum_var) || counter > state.max(self.sum_var) {
            return Err(Failure);
        }
        Ok(())
    }

    fn push_all_unbound_to_one(&self, state: &mut State) -> SolverResult<()> {
        state.switch_on(self.inactive.unwrap());
        let mut counter = 0;
        for &v in &self.vars {
            if state.max(v) == 1 {
                state.set_value(v, 1)?;
                counter += 1;
            }
        }
        if counter < state.min(self.sum_var) || counter > state.max(self.sum_var) {
            return Err(Failure);
        }
        Ok(())
    }

    fn propagate_sum_var(&self, state: &mut State) -> SolverResult<()> {
        if !state.switched(self.inactive.unwrap()) {
            let possible = state.cell(self.num_possible_true.unwrap());
            let always = state.cell(self.num_always_true.unwrap());
            if possible == state.min(self.sum_var) {
                self.push_all_unbound_to_one(state)?;
                state.set_value(self.sum_var, possible)?;
            } else if always == state.max(self.sum_var) {
                self.push_all_unbound_to_zero(state)?;
                state.set_value(self.sum_var, always)?;
            }
        }
        Ok(())
    }
}

impl Constraint for SumBooleanEqualToVar {
    fn name(&self) -> String {
        format!("SumBoolean({} vars) == {:?}", self.vars.len(), self.sum_var)
    }

    fn post(&mut self, ctx: &mut PostCtx) {
        self.num_possible_true = Some(ctx.state.new_cell(0));
        self.num_always_true = Some(ctx.state.new_cell(0));
        self.inactive = Some(ctx.state.new_switch());
        for (i, &v) in self.vars.iter().enumerate() {
            let d = ctx.demon(i as u32, DemonPriority::Normal);
            ctx.state.when_bound(v, d);
        }
        if !ctx.state.bound(self.sum_var) {
            let d = ctx.demon(TARGET_TAG, DemonPriority::Normal);
            ctx.state.when_range(self.sum_var, d);
        }
    }

    fn initial_propagate(&mut self, state: &mut State) -> SolverResult<()> {
        let mut num_always_true = 0;
        let mut possible_true = 0;
        for &v in &self.vars {
            if state.min(v) == 1 {
                num_always_true += 1;
            }
            if state.max(v) == 1 {
                possible_true += 1;
            }
        }
        state.set_range(self.sum_var, num_always_true, possible_true)?;
        let var_min = state.min(self.sum_var);
        let var_max = state.max(self.sum_var);
        if num_always_true == var_max && possible_true > var_max {
            self.push_all_unbound_to_zero(state)
        } else if possible_true == var_min && num_always_true < var_min {
            self.push_all_unbound_to_one(state)
        } else {
            state.set_cell(self.num_possible_true.unwrap(), possible_true);
            state.set_cell(self.num_always_true.unwrap(), num_always_true);
            Ok(())
        }
    }

    fn run(&mut self, state: &mut State, tag: u32) -> SolverResult<()> {
        if tag == TARGET_TAG {
            return self.propagate_sum_var(state);
        }
        let index = tag as usize;
        if !state.switched(self.inactive.unwrap()) {
            debug_assert!(state.bound(self.vars[index]));
            let always = self.num_always_true.unwrap();
            let possible = self.num_possible_true.unwrap();
            if state.min(self.vars[index]) == 0 {
                state.add_cell(possible, -1);
                state.set_range(self.sum_var, state.cell(always), state.cell(possible))?;
                if state.cell(possible) == state.min(self.sum_var) {
                    self.push_all_unbound_to_one(state)?;
                }
            } else {
                state.add_cell(always, 1);
                state.set_range(self.sum_var, state.cell(always), state.cell(possible))?;
                if state.cell(always) == state.max(self.sum_var) {
                    self.push_all_unbound_to_zero(state)?;
                }
            }
        }
        Ok(())
    }
}
