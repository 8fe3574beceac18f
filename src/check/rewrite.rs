//! Construction and rewriting of checker-minted expressions: constant
//! literals, synthetic `length()` calls, logical inversion and constant
//! folding. Freshly built nodes share the identifier interner and get their
//! type and bounds annotations at construction, so facts can alias them
//! without a later checking pass.

use super::*;

use crate::ast::{AssocOp, BinaryOp, ExprKind, UnaryOp};
use crate::interval::IntRange;
use num_traits::{One, Zero};

pub(crate) fn bool_type() -> Rc<TypeExpr> {
    TypeExpr::prim(Prim::Bool)
}

pub(crate) fn u64_type() -> Rc<TypeExpr> {
    TypeExpr::prim(Prim::U64)
}

pub(crate) fn ideal_type() -> Rc<TypeExpr> {
    TypeExpr::prim(Prim::Ideal)
}

/// Builds an ideal-typed constant literal for `cv`, interning its decimal
/// form.
pub(crate) fn make_const_value_expr(tm: &mut IdMap, cv: &BigInt) -> Rc<Expr> {
    let id = tm.insert(&cv.to_string());
    let o = Expr::ident(id);
    o.set_const_value(cv.clone());
    o.set_mbounds(IntRange::single(cv));
    o.set_mtype(ideal_type());
    o
}

/// Builds the synthetic call `x.length()`, typed `u64`.
pub(crate) fn make_slice_length(tm: &mut IdMap, x: &Rc<Expr>) -> Result<Rc<Expr>, CheckError> {
    let recv_typ = x.mtype().ok_or_else(|| {
        CheckError::new(
            ErrorKind::Internal,
            "length() receiver has no resolved type",
        )
    })?;
    let length = tm.insert("length");
    let callee = Expr::new(ExprKind::Selector {
        lhs: x.clone(),
        field: length,
    });
    callee.set_mbounds(IntRange::new(BigInt::one(), BigInt::one()));
    callee.set_mtype(TypeExpr::func(recv_typ, length));
    let call = Expr::new(ExprKind::Call {
        callee,
        args: Vec::new(),
    });
    call.set_mtype(u64_type());
    Ok(call)
}

/// Builds the boolean fact `x.length() == n`.
pub(crate) fn make_slice_length_eq(
    tm: &mut IdMap,
    x: &Rc<Expr>,
    n: &BigInt,
) -> Result<Rc<Expr>, CheckError> {
    let lhs = make_slice_length(tm, x)?;
    let rhs = make_const_value_expr(tm, n);
    let o = Expr::new(ExprKind::Binary {
        op: BinaryOp::Eq,
        lhs,
        rhs,
    });
    o.set_mbounds(IntRange::new(BigInt::zero(), BigInt::one()));
    o.set_mtype(bool_type());
    Ok(o)
}

/// Logical negation by structural inversion: comparisons flip, `and`/`or`
/// distribute by De Morgan, `not x` unwraps, and anything else is wrapped in
/// a fresh `not`. Inverting a non-boolean or constant expression is a checker
/// bug.
pub fn invert(tm: &IdMap, n: &Rc<Expr>) -> Result<Rc<Expr>, CheckError> {
    if !n.is_bool() {
        return Err(CheckError::new(
            ErrorKind::Internal,
            format!("invert({:?}) called on non-bool-typed expression", n.str(tm)),
        ));
    }
    if n.const_value().is_some() {
        return Err(CheckError::new(
            ErrorKind::Internal,
            format!("invert({:?}) called on constant expression", n.str(tm)),
        ));
    }

    let kind = match &n.kind {
        ExprKind::Unary {
            op: UnaryOp::Not,
            operand,
        } => return Ok(operand.clone()),
        ExprKind::Binary { op, lhs, rhs } => match op.invert_comparison() {
            Some(inv) => ExprKind::Binary {
                op: inv,
                lhs: lhs.clone(),
                rhs: rhs.clone(),
            },
            None => match op {
                BinaryOp::And | BinaryOp::Or => ExprKind::Binary {
                    op: if *op == BinaryOp::And {
                        BinaryOp::Or
                    } else {
                        BinaryOp::And
                    },
                    lhs: invert(tm, lhs)?,
                    rhs: invert(tm, rhs)?,
                },
                _ => ExprKind::Unary {
                    op: UnaryOp::Not,
                    operand: n.clone(),
                },
            },
        },
        ExprKind::Assoc { op, args } => {
            let mut inverted = Vec::with_capacity(args.len());
            for a in args {
                inverted.push(invert(tm, a)?);
            }
            ExprKind::Assoc {
                op: match op {
                    AssocOp::And => AssocOp::Or,
                    AssocOp::Or => AssocOp::And,
                },
                args: inverted,
            }
        }
        _ => ExprKind::Unary {
            op: UnaryOp::Not,
            operand: n.clone(),
        },
    };

    let o = Expr::with_effect(kind, n.effect);
    if let Some(t) = n.mtype() {
        o.set_mtype(t);
    }
    Ok(o)
}

/// Constant folding and light normalization. Idempotent: simplifying an
/// already simplified expression returns it unchanged.
pub fn simplify(tm: &mut IdMap, n: &Rc<Expr>) -> Result<Rc<Expr>, CheckError> {
    match &n.kind {
        ExprKind::Binary { op, lhs, rhs } => {
            let op = *op;
            let (lhs, rhs) = (lhs.clone(), rhs.clone());
            let l = simplify(tm, &lhs)?;
            let r = simplify(tm, &rhs)?;

            if let (Some(a), Some(b)) = (l.const_value(), r.const_value()) {
                if let Some(v) = eval_const_binary(op, &a, &b) {
                    return Ok(make_const_value_expr(tm, &v));
                }
            }
            if matches!(op, BinaryOp::Add | BinaryOp::Sub)
                && r.const_value().is_some_and(|v| v.is_zero())
            {
                return Ok(l);
            }
            if op == BinaryOp::Add && l.const_value().is_some_and(|v| v.is_zero()) {
                return Ok(r);
            }

            if Rc::ptr_eq(&l, &lhs) && Rc::ptr_eq(&r, &rhs) {
                return Ok(n.clone());
            }
            let o = Expr::with_effect(ExprKind::Binary { op, lhs: l, rhs: r }, n.effect);
            if let Some(t) = n.mtype() {
                o.set_mtype(t);
            }
            Ok(o)
        }
        ExprKind::Unary {
            op: UnaryOp::Neg,
            operand,
        } => match operand.const_value() {
            Some(v) => Ok(make_const_value_expr(tm, &-v)),
            None => Ok(n.clone()),
        },
        ExprKind::Unary {
            op: UnaryOp::Not,
            operand,
        } => {
            // not (not x) is x.
            if let ExprKind::Unary {
                op: UnaryOp::Not,
                operand: inner,
            } = &operand.kind
            {
                return simplify(tm, &inner.clone());
            }
            Ok(n.clone())
        }
        _ => Ok(n.clone()),
    }
}

fn eval_const_binary(op: BinaryOp, a: &BigInt, b: &BigInt) -> Option<BigInt> {
    let btoi = |v: bool| if v { BigInt::one() } else { BigInt::zero() };
    Some(match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Eq => btoi(a == b),
        BinaryOp::Ne => btoi(a != b),
        BinaryOp::Lt => btoi(a < b),
        BinaryOp::Le => btoi(a <= b),
        BinaryOp::Ge => btoi(a >= b),
        BinaryOp::Gt => btoi(a > b),
        _ => return None,
    })
}
