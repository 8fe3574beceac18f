//! The fact store: boolean expressions known true at the current program
//! point. Facts are compared syntactically; the walker snapshots and restores
//! the store around branches, so a snapshot is never aliased with the live
//! list.

use super::*;

use crate::ast::{BinaryOp, ExprKind};
use crate::interval::IntRange;
use num_bigint::BigInt;
use num_traits::{One, Zero};

#[derive(Default)]
pub(crate) struct Facts {
    list: Vec<Rc<Expr>>,
}

impl Facts {
    pub(crate) fn iter(&self) -> impl Iterator<Item = &Rc<Expr>> {
        self.list.iter()
    }

    pub(crate) fn len(&self) -> usize {
        self.list.len()
    }

    /// Appends `x` unless a syntactically identical fact is already present.
    /// Constants carry no information and are never stored.
    pub(crate) fn append_fact(&mut self, x: Rc<Expr>) {
        if x.const_value().is_some() {
            return;
        }
        if self.list.iter().any(|f| **f == *x) {
            return;
        }
        self.list.push(x);
    }

    /// Appends the comparison `lhs op rhs` as a freshly built boolean fact.
    pub(crate) fn append_binary_op_fact(&mut self, op: BinaryOp, lhs: Rc<Expr>, rhs: Rc<Expr>) {
        let o = Expr::new(ExprKind::Binary { op, lhs, rhs });
        o.set_mtype(TypeExpr::prim(Prim::Bool));
        o.set_mbounds(IntRange::new(BigInt::zero(), BigInt::one()));
        self.append_fact(o);
    }

    /// Maps `f` over every fact; facts mapped to `None` are dropped.
    pub(crate) fn update<F>(&mut self, mut f: F) -> Result<(), CheckError>
    where
        F: FnMut(&Rc<Expr>) -> Result<Option<Rc<Expr>>, CheckError>,
    {
        let mut out = Vec::with_capacity(self.list.len());
        for x in &self.list {
            if let Some(y) = f(x)? {
                out.push(y);
            }
        }
        self.list = out;
        Ok(())
    }

    pub(crate) fn snapshot(&self) -> Vec<Rc<Expr>> {
        self.list.clone()
    }

    pub(crate) fn restore(&mut self, snap: Vec<Rc<Expr>>) {
        self.list = snap;
    }

    pub(crate) fn clear(&mut self) {
        self.list.clear();
    }

    /// Narrows `b` using facts that compare `n` with a constant. Refinement
    /// only ever shrinks the interval; shrinking it to nothing means the
    /// facts contradict the derived bounds.
    pub(crate) fn refine(
        &self,
        n: &Rc<Expr>,
        b: IntRange,
        tm: &IdMap,
    ) -> Result<IntRange, CheckError> {
        let mut b = b;
        for x in &self.list {
            let ExprKind::Binary { op, lhs, rhs } = &x.kind else {
                continue;
            };
            if !op.is_comparison() {
                continue;
            }
            let (op, c) = if **lhs == **n {
                match rhs.const_value() {
                    Some(cv) => (*op, cv),
                    None => continue,
                }
            } else if **rhs == **n {
                match (lhs.const_value(), op.swap_comparison()) {
                    (Some(cv), Some(sw)) => (sw, cv),
                    _ => continue,
                }
            } else {
                continue;
            };

            match op {
                BinaryOp::Eq => {
                    if c > b.min {
                        b.min = c.clone();
                    }
                    if c < b.max {
                        b.max = c;
                    }
                }
                BinaryOp::Ne => {
                    if c == b.min {
                        b.min += BigInt::one();
                    } else if c == b.max {
                        b.max -= BigInt::one();
                    }
                }
                BinaryOp::Lt => {
                    let hi = c - BigInt::one();
                    if hi < b.max {
                        b.max = hi;
                    }
                }
                BinaryOp::Le => {
                    if c < b.max {
                        b.max = c;
                    }
                }
                BinaryOp::Ge => {
                    if c > b.min {
                        b.min = c;
                    }
                }
                BinaryOp::Gt => {
                    let lo = c + BigInt::one();
                    if lo > b.min {
                        b.min = lo;
                    }
                }
                _ => {}
            }
        }

        if b.is_empty() {
            return Err(CheckError::new(
                ErrorKind::Internal,
                format!("facts refine {:?} to an empty interval", n.str(tm)),
            ));
        }
        Ok(b)
    }
}
