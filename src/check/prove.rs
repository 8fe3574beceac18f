//! The assertion prover. A condition is discharged by a syntactic fact hit,
//! by being a constant true, by a named reason lemma, or by the binary-op
//! rules: constant evaluation, interval comparison, fact matching (with
//! implication and operand swap) and bounded transitive chaining through the
//! facts.

use super::*;

use crate::ast::{BinaryOp, ExprKind};
use crate::interval::IntRange;
use log::trace;
use num_traits::One;

// Transitive chains recurse through fact right-hand sides; this bounds the
// chain length.
const MAX_PROOF_DEPTH: u32 = 16;

pub(crate) type ReasonFn = Box<dyn Fn(&mut Checker<'_>, &Assert) -> Result<(), CheckError>>;

/// The fixed registry of named proof lemmas a program may cite with
/// `assert ... via "..."`. Each lemma is keyed by its quoted statement.
pub struct ReasonMap {
    map: HashMap<String, ReasonFn>,
}

impl Default for ReasonMap {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl ReasonMap {
    pub fn with_builtins() -> Self {
        let mut rm = ReasonMap {
            map: HashMap::new(),
        };
        rm.insert_transitivity("a < b: a < c; c <= b", BinaryOp::Lt, BinaryOp::Lt, BinaryOp::Le);
        rm.insert_transitivity("a < b: a <= c; c < b", BinaryOp::Lt, BinaryOp::Le, BinaryOp::Lt);
        rm.insert_transitivity("a <= b: a <= c; c <= b", BinaryOp::Le, BinaryOp::Le, BinaryOp::Le);
        rm.insert_transitivity("a > b: a > c; c >= b", BinaryOp::Gt, BinaryOp::Gt, BinaryOp::Ge);
        rm.insert_transitivity("a >= b: a >= c; c >= b", BinaryOp::Ge, BinaryOp::Ge, BinaryOp::Ge);
        rm
    }

    fn insert_transitivity(
        &mut self,
        name: &'static str,
        goal: BinaryOp,
        first: BinaryOp,
        second: BinaryOp,
    ) {
        self.map.insert(
            name.to_string(),
            Box::new(move |q, n| q.prove_via_transitivity(n, goal, first, second)),
        );
    }

    pub(crate) fn get(&self, name: &str) -> Option<&ReasonFn> {
        self.map.get(name)
    }
}

impl Checker<'_> {
    pub(crate) fn bcheck_assert(&mut self, n: &Assert) -> Result<(), CheckError> {
        self.err_line = n.line;

        // Cached intervals reflect the facts in force when they were set;
        // asserts are re-checked in fresh contexts (loop entry, continues),
        // so derive them anew.
        n.condition.drop_cached_mbounds();
        for (_, value) in &n.args {
            value.drop_cached_mbounds();
        }

        let condition = n.condition.clone();
        self.bcheck_expr(&condition, 0)?;
        for (_, value) in &n.args {
            self.bcheck_expr(value, 0)?;
        }

        if self.facts.iter().any(|x| **x == *condition) {
            return Ok(());
        }

        let mut proved = false;
        let mut reason_err: Option<CheckError> = None;

        if let Some(cv) = condition.const_value() {
            proved = cv.is_one();
        } else if let Some(reason_id) = n.reason {
            let name = self.tm.name(reason_id).to_string();
            let reasons = self.reasons;
            match reasons.get(&name) {
                Some(f) => match f(self, n) {
                    Ok(()) => proved = true,
                    Err(e) => reason_err = Some(e),
                },
                None => {
                    return Err(self.fail(
                        ErrorKind::IllegalArgument,
                        format!("no such reason {}", name),
                    ));
                }
            }
        } else if let ExprKind::Binary { op, lhs, rhs } = &condition.kind {
            let (op, lhs, rhs) = (*op, lhs.clone(), rhs.clone());
            proved = self.prove_binary_op(op, &lhs, &rhs)?;
        }

        if !proved {
            // Keep the source form of the condition; that is what the user
            // needs to see.
            let msg = match reason_err {
                Some(e) => format!(
                    "cannot prove {:?}: {}",
                    condition.str(self.tm),
                    e.message
                ),
                None => format!("cannot prove {:?}", condition.str(self.tm)),
            };
            return Err(self.fail(ErrorKind::CannotProve, msg));
        }

        let simplified = simplify(self.tm, &condition)?;
        trace!("fact: {}", simplified.str(self.tm));
        self.facts.append_fact(simplified);
        Ok(())
    }

    // "a ? b: a ?1 c; c ?2 b" — the hypothesis c is cited as a reason
    // argument, and both legs are discharged against the facts.
    fn prove_via_transitivity(
        &mut self,
        n: &Assert,
        goal: BinaryOp,
        first: BinaryOp,
        second: BinaryOp,
    ) -> Result<(), CheckError> {
        let ExprKind::Binary { op, lhs, rhs } = &n.condition.kind else {
            return Err(self.fail(
                ErrorKind::IllegalArgument,
                format!(
                    "reason does not apply to condition {:?}",
                    n.condition.str(self.tm)
                ),
            ));
        };
        if *op != goal {
            return Err(self.fail(
                ErrorKind::IllegalArgument,
                format!(
                    "reason does not apply to condition {:?}",
                    n.condition.str(self.tm)
                ),
            ));
        }
        let (a, b) = (lhs.clone(), rhs.clone());
        let c = n
            .args
            .iter()
            .find(|(id, _)| self.tm.name(*id) == "c")
            .map(|(_, v)| v.clone())
            .ok_or_else(|| {
                self.fail(
                    ErrorKind::IllegalArgument,
                    "reason needs a hypothesis argument c",
                )
            })?;
        self.prove_reason_requirement(first, &a, &c)?;
        self.prove_reason_requirement(second, &c, &b)?;
        Ok(())
    }

    pub(crate) fn prove_reason_requirement(
        &mut self,
        op: BinaryOp,
        lhs: &Rc<Expr>,
        rhs: &Rc<Expr>,
    ) -> Result<(), CheckError> {
        if self.prove_binary_op(op, lhs, rhs)? {
            return Ok(());
        }
        Err(self.fail(
            ErrorKind::CannotProve,
            format!(
                "cannot prove {:?}",
                format!(
                    "{} {} {}",
                    lhs.str(self.tm),
                    op.symbol(),
                    rhs.str(self.tm)
                )
            ),
        ))
    }

    /// Whether `op(lhs, rhs)` is entailed. `Ok(false)` means "not proven",
    /// not "false".
    pub(crate) fn prove_binary_op(
        &mut self,
        op: BinaryOp,
        lhs: &Rc<Expr>,
        rhs: &Rc<Expr>,
    ) -> Result<bool, CheckError> {
        self.prove_binary_op_depth(op, lhs, rhs, 0)
    }

    fn prove_binary_op_depth(
        &mut self,
        op: BinaryOp,
        lhs: &Rc<Expr>,
        rhs: &Rc<Expr>,
        depth: u32,
    ) -> Result<bool, CheckError> {
        if depth > MAX_PROOF_DEPTH {
            return Ok(false);
        }
        match op {
            BinaryOp::Gt => return self.prove_binary_op_depth(BinaryOp::Lt, rhs, lhs, depth),
            BinaryOp::Ge => return self.prove_binary_op_depth(BinaryOp::Le, rhs, lhs, depth),
            _ => {}
        }
        if !op.is_comparison() {
            return Ok(false);
        }

        if let (Some(a), Some(b)) = (lhs.const_value(), rhs.const_value()) {
            return Ok(eval_comparison(op, &a, &b));
        }

        let lb = self.bounds_of(lhs)?;
        let rb = self.bounds_of(rhs)?;
        let by_bounds = match op {
            BinaryOp::Lt => lb.max < rb.min,
            BinaryOp::Le => lb.max <= rb.min,
            BinaryOp::Eq => lb.min == lb.max && rb.min == rb.max && lb.min == rb.min,
            BinaryOp::Ne => lb.max < rb.min || rb.max < lb.min,
            _ => false,
        };
        if by_bounds {
            return Ok(true);
        }

        // Direct fact hits, in either orientation; along the way, collect
        // upper bounds on lhs and lower bounds on rhs as candidates for a
        // transitive chain.
        let mut lhs_mids: Vec<(BinaryOp, Rc<Expr>)> = Vec::new();
        let mut rhs_mids: Vec<(BinaryOp, Rc<Expr>)> = Vec::new();
        for x in self.facts.iter() {
            let ExprKind::Binary {
                op: fop,
                lhs: fl,
                rhs: fr,
            } = &x.kind
            else {
                continue;
            };
            if !fop.is_comparison() {
                continue;
            }
            if **fl == **lhs && **fr == **rhs && implies(*fop, op) {
                return Ok(true);
            }
            if let Some(sw) = fop.swap_comparison() {
                if **fl == **rhs && **fr == **lhs && implies(sw, op) {
                    return Ok(true);
                }
            }

            if matches!(op, BinaryOp::Lt | BinaryOp::Le) {
                if **fl == **lhs
                    && matches!(fop, BinaryOp::Lt | BinaryOp::Le | BinaryOp::Eq)
                {
                    lhs_mids.push((*fop, fr.clone()));
                } else if **fr == **lhs {
                    if let Some(sw) = fop.swap_comparison() {
                        if matches!(sw, BinaryOp::Lt | BinaryOp::Le | BinaryOp::Eq) {
                            lhs_mids.push((sw, fl.clone()));
                        }
                    }
                }

                if **fl == **rhs
                    && matches!(fop, BinaryOp::Gt | BinaryOp::Ge | BinaryOp::Eq)
                {
                    rhs_mids.push((*fop, fr.clone()));
                } else if **fr == **rhs {
                    if let Some(sw) = fop.swap_comparison() {
                        if matches!(sw, BinaryOp::Gt | BinaryOp::Ge | BinaryOp::Eq) {
                            rhs_mids.push((sw, fl.clone()));
                        }
                    }
                }
            }
        }

        // "lhs < mid <= rhs" and "lhs <= mid < rhs" both give strict
        // inequality; one strict leg is enough.
        for (fop, mid) in lhs_mids {
            let needed = match (op, fop) {
                (BinaryOp::Lt, BinaryOp::Lt) => BinaryOp::Le,
                (BinaryOp::Lt, _) => BinaryOp::Lt,
                _ => BinaryOp::Le,
            };
            if self.prove_binary_op_depth(needed, &mid, rhs, depth + 1)? {
                return Ok(true);
            }
        }
        for (fop, mid) in rhs_mids {
            let needed = match (op, fop) {
                (BinaryOp::Lt, BinaryOp::Gt) | (BinaryOp::Le, BinaryOp::Gt) => BinaryOp::Le,
                (BinaryOp::Lt, _) => BinaryOp::Lt,
                _ => BinaryOp::Le,
            };
            if self.prove_binary_op_depth(needed, lhs, &mid, depth + 1)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn bounds_of(&mut self, n: &Rc<Expr>) -> Result<IntRange, CheckError> {
        match n.mbounds() {
            Some(b) => Ok(b),
            None => self.bcheck_expr(n, 0),
        }
    }

    /// Whether the facts contain `ident.is_error()`.
    pub(crate) fn has_is_error_fact(&self, id: Ident) -> bool {
        let Some(is_error) = self.tm.get("is_error") else {
            return false;
        };
        self.facts.iter().any(|x| match x.is_method_call() {
            Some((recv, meth, args)) => {
                meth == is_error && args.is_empty() && recv.as_ident() == Some(id)
            }
            None => false,
        })
    }
}

fn implies(f: BinaryOp, goal: BinaryOp) -> bool {
    if f == goal {
        return true;
    }
    match goal {
        BinaryOp::Le => matches!(f, BinaryOp::Lt | BinaryOp::Eq),
        BinaryOp::Ge => matches!(f, BinaryOp::Gt | BinaryOp::Eq),
        BinaryOp::Ne => matches!(f, BinaryOp::Lt | BinaryOp::Gt),
        _ => false,
    }
}

fn eval_comparison(op: BinaryOp, a: &BigInt, b: &BigInt) -> bool {
    match op {
        BinaryOp::Eq => a == b,
        BinaryOp::Ne => a != b,
        BinaryOp::Lt => a < b,
        BinaryOp::Le => a <= b,
        BinaryOp::Ge => a >= b,
        BinaryOp::Gt => a > b,
        _ => false,
    }
}
