//! Forward symbolic bounds-and-assertion checking.
//!
//! The checker walks a typed function body, carrying a store of boolean facts
//! known true at the current program point, and proves that every numeric
//! expression stays inside its declared range, that every index and slice is
//! in range, that impure method preconditions hold, and that programmer
//! assertions follow from context. Each checked expression is annotated with
//! a tight `[min, max]` interval; code generation relies on those proofs to
//! emit untrapped arithmetic.
//!
//! Proofs are syntactic: interval arithmetic, fact matching, and a fixed table
//! of named lemmas. There is no solver backend.

use std::collections::HashMap;
use std::rc::Rc;

use log::debug;
use num_bigint::BigInt;
use num_traits::Zero;
use thiserror::Error;

use crate::ast::{Assert, ConstDecl, Expr, FuncDecl, Prim, TypeExpr};
use crate::token::{IdMap, Ident};

mod facts;
use facts::Facts;

mod expr;
mod io_methods;
mod prove;
mod rewrite;
mod stmt;

pub use prove::ReasonMap;
pub use rewrite::{invert, simplify};

/// Maximum expression recursion depth.
pub const MAX_EXPR_DEPTH: u32 = 255;

/// Hard ceiling on the number of arms unified after an if-else chain.
pub const MAX_IF_BRANCHES: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// An assertion, index, call precondition, or null check is not entailed
    /// by the current facts.
    CannotProve,
    /// A computed interval escapes the declared type range.
    OutOfBounds,
    /// A structurally valid expression with an inadmissible operand: signed
    /// shift LHS, possibly-zero divisor, negative bitwise operand, unknown
    /// reason.
    IllegalArgument,
    /// Malformed or oversized input: unreachable code, recursion too deep,
    /// too many branches.
    Structural,
    /// A checker invariant was violated.
    Internal,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("check: {message} ({filename}:{line})")]
pub struct CheckError {
    pub kind: ErrorKind,
    pub message: String,
    pub filename: String,
    pub line: u32,
}

impl CheckError {
    pub(crate) fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            filename: String::new(),
            line: 0,
        }
    }

    /// Fills in the source location unless one is already present.
    pub(crate) fn at(mut self, filename: &str, line: u32) -> Self {
        if self.filename.is_empty() {
            self.filename = filename.to_string();
            self.line = line;
        }
        self
    }
}

/// Checks one function body, annotating every expression it visits.
pub fn check_func(
    tm: &mut IdMap,
    consts: &HashMap<Ident, Rc<ConstDecl>>,
    funcs: &HashMap<Ident, Rc<FuncDecl>>,
    reasons: &ReasonMap,
    func: &Rc<FuncDecl>,
) -> Result<(), CheckError> {
    Checker::new(tm, consts, funcs, reasons, func.clone()).check()
}

pub struct Checker<'a> {
    tm: &'a mut IdMap,
    consts: &'a HashMap<Ident, Rc<ConstDecl>>,
    funcs: &'a HashMap<Ident, Rc<FuncDecl>>,
    reasons: &'a ReasonMap,
    func: Rc<FuncDecl>,
    facts: Facts,
    err_line: u32,

    // Shared leaf expressions, built once per checker.
    zero_expr: Rc<Expr>,
    nullptr_expr: Rc<Expr>,
    args_expr: Rc<Expr>,
    this_expr: Rc<Expr>,
}

impl<'a> Checker<'a> {
    pub fn new(
        tm: &'a mut IdMap,
        consts: &'a HashMap<Ident, Rc<ConstDecl>>,
        funcs: &'a HashMap<Ident, Rc<FuncDecl>>,
        reasons: &'a ReasonMap,
        func: Rc<FuncDecl>,
    ) -> Self {
        let zero_expr = rewrite::make_const_value_expr(tm, &BigInt::zero());
        let nullptr_expr = Expr::ident(tm.insert("nullptr"));
        nullptr_expr.set_mtype(TypeExpr::prim(Prim::Nullptr));
        let args_expr = Expr::ident(tm.insert("args"));
        args_expr.set_mtype(TypeExpr::prim(Prim::EmptyStruct));
        let this_expr = Expr::ident(tm.insert("this"));
        this_expr.set_mtype(TypeExpr::prim(Prim::EmptyStruct));

        Self {
            tm,
            consts,
            funcs,
            reasons,
            func,
            facts: Facts::default(),
            err_line: 0,
            zero_expr,
            nullptr_expr,
            args_expr,
            this_expr,
        }
    }

    /// Runs the check: seed the in-facts from the function's declared
    /// assertions, then walk the body.
    pub fn check(&mut self) -> Result<(), CheckError> {
        let func = self.func.clone();
        debug!("bcheck func at {}", func.filename);

        let result = self.check_inner(&func);
        result.map_err(|e| e.at(&func.filename, self.err_line))
    }

    fn check_inner(&mut self, func: &FuncDecl) -> Result<(), CheckError> {
        for assert in &func.asserts {
            self.assume_in_fact(assert)?;
        }
        self.bcheck_block(&func.body)
    }

    // Declared preconditions are assumed, not proved; the caller discharges
    // them at each call site.
    fn assume_in_fact(&mut self, assert: &Assert) -> Result<(), CheckError> {
        self.err_line = assert.line;
        self.bcheck_expr(&assert.condition, 0)?;
        for (_, value) in &assert.args {
            self.bcheck_expr(value, 0)?;
        }
        self.facts.append_fact(assert.condition.clone());
        Ok(())
    }

    pub(crate) fn fail(&self, kind: ErrorKind, message: impl Into<String>) -> CheckError {
        CheckError::new(kind, message).at(&self.func.filename, self.err_line)
    }

    pub(crate) fn mtype_of(&self, n: &Expr) -> Result<Rc<TypeExpr>, CheckError> {
        n.mtype().ok_or_else(|| {
            self.fail(
                ErrorKind::Internal,
                format!("expression {:?} has no resolved type", n.str(self.tm)),
            )
        })
    }
}
