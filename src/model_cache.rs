//! Canonical-form deduplication of expressions and constraints.
//!
//! Factories consult the cache before building so repeated subexpressions
//! share structure. Keys combine an operation tag with the identities of
//! the operands. Inserts are silently rejected while the solver is in
//! search: a cached object created below a choice point would not survive
//! backtracking.

use crate::core::{ConstraintId, IntCst, VarRef};
use std::collections::HashMap;

/// Operation tag of a cached expression.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ExprOp {
    Opposite,
    Abs,
    Sum,
    Min,
    Max,
    ScalProd,
}

/// Operation tag of a cached constraint.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum CtOp {
    Equality,
    NonEquality,
    LessOrEqual,
    GreaterOrEqual,
    BetweenCt,
}

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
enum Operands {
    Expr(VarRef),
    VarCst(VarRef, IntCst),
    VarVar(VarRef, VarRef),
    VarCstCst(VarRef, IntCst, IntCst),
    VarCstArray(VarRef, Vec<IntCst>),
    VarArray(Vec<VarRef>),
    VarArrayCstArray(Vec<VarRef>, Vec<IntCst>),
}

pub struct ModelCache {
    expressions: HashMap<(ExprOp, Operands), VarRef>,
    constraints: HashMap<(CtOp, Operands), ConstraintId>,
    /// True while the solver is in search; inserts are refused then.
    in_search: bool,
}

impl ModelCache {
    pub fn new(initial_size: usize) -> Self {
        ModelCache {
            expressions: HashMap::with_capacity(initial_size),
            constraints: HashMap::with_capacity(initial_size),
            in_search: false,
        }
    }

    pub fn set_in_search(&mut self, in_search: bool) {
        self.in_search = in_search;
    }

    fn find_expr(&self, op: ExprOp, operands: Operands) -> Option<VarRef> {
        self.expressions.get(&(op, operands)).copied()
    }

    fn insert_expr(&mut self, op: ExprOp, operands: Operands, result: VarRef) {
        if !self.in_search {
            self.expressions.insert((op, operands), result);
        }
    }

    fn find_ct(&self, op: CtOp, operands: Operands) -> Option<ConstraintId> {
        self.constraints.get(&(op, operands)).copied()
    }

    fn insert_ct(&mut self, op: CtOp, operands: Operands, result: ConstraintId) {
        if !self.in_search {
            self.constraints.insert((op, operands), result);
        }
    }

    // ----- Expression families -----

    pub fn find_expr_expression(&self, op: ExprOp, e: VarRef) -> Option<VarRef> {
        self.find_expr(op, Operands::Expr(e))
    }

    pub fn insert_expr_expression(&mut self, op: ExprOp, e: VarRef, result: VarRef) {
        self.insert_expr(op, Operands::Expr(e), result);
    }

    pub fn find_var_constant_expression(&self, op: ExprOp, var: VarRef, cst: IntCst) -> Option<VarRef> {
        self.find_expr(op, Operands::VarCst(var, cst))
    }

    pub fn insert_var_constant_expression(&mut self, op: ExprOp, var: VarRef, cst: IntCst, result: VarRef) {
        self.insert_expr(op, Operands::VarCst(var, cst), result);
    }

    pub fn find_var_var_expression(&self, op: ExprOp, a: VarRef, b: VarRef) -> Option<VarRef> {
        self.find_expr(op, Operands::VarVar(a, b))
    }

    pub fn insert_var_var_expression(&mut self, op: ExprOp, a: VarRef, b: VarRef, result: VarRef) {
        self.insert_expr(op, Operands::VarVar(a, b), result);
    }

    pub fn find_var_constant_constant_expression(
        &self,
        op: ExprOp,
        var: VarRef,
        c1: IntCst,
        c2: IntCst,
    ) -> Option<VarRef> {
        self.find_expr(op, Operands::VarCstCst(var, c1, c2))
    }

    pub fn insert_var_constant_constant_expression(
        &mut self,
        op: ExprOp,
        var: VarRef,
        c1: IntCst,
        c2: IntCst,
        result: VarRef,
    ) {
        self.insert_expr(op, Operands::VarCstCst(var, c1, c2), result);
    }

    pub fn find_var_constant_array_expression(&self, op: ExprOp, var: VarRef, csts: &[IntCst]) -> Option<VarRef> {
        self.find_expr(op, Operands::VarCstArray(var, csts.to_vec()))
    }

    pub fn insert_var_constant_array_expression(
        &mut self,
        op: ExprOp,
        var: VarRef,
        csts: &[IntCst],
        result: VarRef,
    ) {
        self.insert_expr(op, Operands::VarCstArray(var, csts.to_vec()), result);
    }

    pub fn find_var_array_expression(&self, op: ExprOp, vars: &[VarRef]) -> Option<VarRef> {
        self.find_expr(op, Operands::VarArray(vars.to_vec()))
    }

    pub fn insert_var_array_expression(&mut self, op: ExprOp, vars: &[VarRef], result: VarRef) {
        self.insert_expr(op, Operands::VarArray(vars.to_vec()), result);
    }

    pub fn find_var_array_constant_array_expression(
        &self,
        op: ExprOp,
        vars: &[VarRef],
        csts: &[IntCst],
    ) -> Option<VarRef> {
        self.find_expr(op, Operands::VarArrayCstArray(vars.to_vec(), csts.to_vec()))
    }

    pub fn insert_var_array_constant_array_expression(
        &mut self,
        op: ExprOp,
        vars: &[VarRef],
        csts: &[IntCst],
        result: VarRef,
    ) {
        self.insert_expr(op, Operands::VarArrayCstArray(vars.to_vec(), csts.to_vec()), result);
    }

    // ----- Constraint families -----

    pub fn find_var_constant_constraint(&self, op: CtOp, var: VarRef, cst: IntCst) -> Option<ConstraintId> {
        self.find_ct(op, Operands::VarCst(var, cst))
    }

    pub fn insert_var_constant_constraint(&mut self, op: CtOp, var: VarRef, cst: IntCst, result: ConstraintId) {
        self.insert_ct(op, Operands::VarCst(var, cst), result);
    }

    pub fn find_var_var_constraint(&self, op: CtOp, a: VarRef, b: VarRef) -> Option<ConstraintId> {
        self.find_ct(op, Operands::VarVar(a, b))
    }

    pub fn insert_var_var_constraint(&mut self, op: CtOp, a: VarRef, b: VarRef, result: ConstraintId) {
        self.insert_ct(op, Operands::VarVar(a, b), result);
    }

    pub fn find_var_constant_constant_constraint(
        &self,
        op: CtOp,
        var: VarRef,
        c1: IntCst,
        c2: IntCst,
    ) -> Option<ConstraintId> {
        self.find_ct(op, Operands::VarCstCst(var, c1, c2))
    }

    pub fn insert_var_constant_constant_constraint(
        &mut self,
        op: CtOp,
        var: VarRef,
        c1: IntCst,
        c2: IntCst,
        result: ConstraintId,
    ) {
        self.insert_ct(op, Operands::VarCstCst(var, c1, c2), result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(i: u32) -> VarRef {
        VarRef::from_u32(i)
    }

    #[test]
    fn test_hit_and_miss() {
        let mut cache = ModelCache::new(16);
        let vars = [var(0), var(1), var(2)];
        assert_eq!(cache.find_var_array_expression(ExprOp::Sum, &vars), None);
        cache.insert_var_array_expression(ExprOp::Sum, &vars, var(9));
        assert_eq!(cache.find_var_array_expression(ExprOp::Sum, &vars), Some(var(9)));
        // Same operands under a different operation: distinct entry.
        assert_eq!(cache.find_var_array_expression(ExprOp::Min, &vars), None);
        // Different order of operands: distinct entry.
        let swapped = [var(1), var(0), var(2)];
        assert_eq!(cache.find_var_array_expression(ExprOp::Sum, &swapped), None);
    }

    #[test]
    fn test_inserts_rejected_in_search() {
        let mut cache = ModelCache::new(16);
        cache.set_in_search(true);
        cache.insert_var_constant_expression(ExprOp::Sum, var(0), 5, var(1));
        assert_eq!(cache.find_var_constant_expression(ExprOp::Sum, var(0), 5), None);
        cache.set_in_search(false);
        cache.insert_var_constant_expression(ExprOp::Sum, var(0), 5, var(1));
        assert_eq!(cache.find_var_constant_expression(ExprOp::Sum, var(0), 5), Some(var(1)));
    }
}
