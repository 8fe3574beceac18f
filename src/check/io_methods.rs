//! Special-case rules for builtin method calls whose output bounds or
//! preconditions depend on argument values: numeric bit extraction and
//! min/max, I/O buffer peeks/pokes/writes and their byte advances, history
//! copies, and CPU-arch vector loads/stores. The byte advance of a consuming
//! method shrinks what is known about the buffer's remaining length.

use super::*;

use crate::ast::{BinaryOp, ExprKind};
use crate::interval::{bit_mask, IntRange};
use log::trace;
use num_traits::{One, ToPrimitive, Zero};

impl Checker<'_> {
    /// Returns `Some(bounds)` for value-special methods (`low_bits`, `min`,
    /// ...); `None` falls through to the callee's declared type bounds, after
    /// any advance precondition has been proved and applied.
    pub(crate) fn bcheck_expr_call_special_cases(
        &mut self,
        n: &Rc<Expr>,
        depth: u32,
    ) -> Result<Option<IntRange>, CheckError> {
        let Some((recv, method, args)) = n.is_method_call() else {
            return Ok(None);
        };
        let (recv, args) = (recv.clone(), args.to_vec());
        let method_name = self.tm.name(method).to_string();
        let Some(recv_typ) = recv.mtype() else {
            return Ok(None);
        };

        let mut advance: Option<BigInt> = None;
        let mut advance_expr: Option<Rc<Expr>> = None;
        let mut update = false;

        if recv_typ.is_num_type() {
            match method_name.as_str() {
                // The output bound depends on the argument's bound, like a
                // dependent type; it isn't expressible in the surface
                // function syntax.
                "low_bits" | "high_bits" => {
                    let arg0 = args.first().cloned().ok_or_else(|| {
                        self.fail(
                            ErrorKind::Internal,
                            "low_bits/high_bits has unexpected arguments",
                        )
                    })?;
                    let ab = self.bcheck_expr(&arg0, depth)?;
                    let n_bits = ab.max.to_u64().filter(|v| *v <= 64).ok_or_else(|| {
                        self.fail(
                            ErrorKind::IllegalArgument,
                            format!("bit count {:?} is out of range", arg0.str(self.tm)),
                        )
                    })?;
                    return Ok(Some(IntRange::new(BigInt::zero(), bit_mask(n_bits))));
                }

                "min" | "max" => {
                    let arg0 = args.first().cloned().ok_or_else(|| {
                        self.fail(ErrorKind::Internal, "min/max has unexpected arguments")
                    })?;
                    let lb = self.bcheck_expr(&recv, depth)?;
                    let ab = self.bcheck_expr(&arg0, depth)?;
                    let b = if method_name == "min" {
                        IntRange::new(lb.min.min(ab.min), lb.max.min(ab.max))
                    } else {
                        IntRange::new(lb.min.max(ab.min), lb.max.max(ab.max))
                    };
                    return Ok(Some(b));
                }

                _ => {}
            }
        } else if recv_typ.is_io_token_type() {
            match method_name.as_str() {
                "undo_byte" => self.can_undo_byte(&recv)?,

                "limited_copy_u32_from_history_8_byte_chunks_fast" => self
                    .can_limited_copy_from_history_fast(
                        &recv,
                        &args,
                        Some(&BigInt::from(8)),
                        &BigInt::from(8),
                    )?,

                "limited_copy_u32_from_history_fast" => {
                    self.can_limited_copy_from_history_fast(&recv, &args, None, &BigInt::one())?
                }

                "skip_u32_fast" => {
                    if args.len() != 2 {
                        return Err(self.fail(ErrorKind::Internal, "bad skip_fast arguments"));
                    }
                    let actual = args[0].clone();
                    let worst_case = args[1].clone();
                    if *actual == *worst_case {
                        // Proving "x <= x" is trivial.
                    } else if !self.prove_binary_op(BinaryOp::Le, &actual, &worst_case)? {
                        return Err(self.fail(
                            ErrorKind::CannotProve,
                            format!(
                                "could not prove skip_fast pre-condition: {} <= {}",
                                actual.str(self.tm),
                                worst_case.str(self.tm)
                            ),
                        ));
                    }
                    match worst_case.const_value() {
                        Some(cv) => advance = Some(cv),
                        None => advance_expr = Some(actual),
                    }
                    update = true;
                }

                "peek_u64le_at" => {
                    if args.len() != 1 {
                        return Err(
                            self.fail(ErrorKind::Internal, "bad peek_u64le_at arguments")
                        );
                    }
                    let Some(cv) = args[0].const_value() else {
                        return Err(self.fail(
                            ErrorKind::IllegalArgument,
                            "peek_u64le_at offset is not a constant value",
                        ));
                    };
                    advance = Some(cv + BigInt::from(8));
                    update = false;
                }

                _ => {
                    if let Some((adv, upd)) = io_method_advance(&method_name) {
                        advance = Some(BigInt::from(adv));
                        update = upd;
                    }
                }
            }
        } else if recv_typ.is_slice_u8() {
            if let Some((adv, upd)) = io_method_advance(&method_name) {
                advance = Some(BigInt::from(adv));
                update = upd;
            }
        } else if recv_typ.is_cpu_arch_type()
            && (method_name.starts_with("make_") || method_name.starts_with("store_"))
        {
            advance = cpu_arch_advance(&method_name).map(BigInt::from);
        }

        if advance.is_some() || advance_expr.is_some() {
            // CPU-arch loads and stores move through their first argument (a
            // slice), not the receiver.
            let subject = if recv_typ.is_cpu_arch_type() {
                args.first().cloned().ok_or_else(|| {
                    self.fail(
                        ErrorKind::Internal,
                        "cpu-arch slice method has no slice argument",
                    )
                })?
            } else {
                recv.clone()
            };
            let ok = self.optimize_io_method_advance(
                &subject,
                advance.as_ref(),
                advance_expr.as_ref(),
                update,
            )?;
            if !ok {
                let adv = match (&advance, &advance_expr) {
                    (Some(a), _) => a.to_string(),
                    (_, Some(e)) => e.str(self.tm),
                    _ => String::new(),
                };
                return Err(self.fail(
                    ErrorKind::CannotProve,
                    format!(
                        "could not prove {} pre-condition: {}.length() >= {}",
                        method_name,
                        subject.str(self.tm),
                        adv
                    ),
                ));
            }
        }

        Ok(None)
    }

    // Undoing a byte needs an explicit "recv.can_undo_byte()" fact; using it
    // up invalidates everything known about the receiver.
    fn can_undo_byte(&mut self, recv: &Rc<Expr>) -> Result<(), CheckError> {
        let can_undo = self.tm.get("can_undo_byte");
        let found = can_undo.is_some_and(|id| {
            self.facts.iter().any(|x| {
                matches!(x.is_method_call(),
                    Some((r, m, a)) if m == id && a.is_empty() && **r == **recv)
            })
        });
        if !found {
            return Err(self.fail(
                ErrorKind::CannotProve,
                format!("could not prove {}.can_undo_byte()", recv.str(self.tm)),
            ));
        }
        let recv_c = recv.clone();
        self.facts
            .update(|o| Ok(if o.mentions(&recv_c) { None } else { Some(o.clone()) }))
    }

    // Three pre-conditions, matched against the facts:
    //  - ((up_to + adj) as u64) <= recv.length()
    //  - distance >= min_distance
    //  - (distance as u64) <= recv.history_length()
    // adj may be absent, in which case (up_to + adj) is just up_to.
    fn can_limited_copy_from_history_fast(
        &mut self,
        recv: &Rc<Expr>,
        args: &[Rc<Expr>],
        adj: Option<&BigInt>,
        min_distance: &BigInt,
    ) -> Result<(), CheckError> {
        if args.len() != 2 {
            return Err(self.fail(
                ErrorKind::Internal,
                "inconsistent limited_copy_u32_from_history_fast arguments",
            ));
        }
        let up_to = &args[0];
        let distance = &args[1];

        let check0 = self.facts.iter().any(|x| {
            let ExprKind::Binary {
                op: BinaryOp::Le,
                lhs,
                rhs,
            } = &x.kind
            else {
                return false;
            };
            let ExprKind::As { operand, target } = &lhs.kind else {
                return false;
            };
            if target.prim_kind() != Some(Prim::U64) {
                return false;
            }
            let operand_ok = match adj {
                None => **operand == **up_to,
                Some(a) => {
                    let ExprKind::Binary {
                        op: BinaryOp::Add,
                        lhs: al,
                        rhs: ar,
                    } = &operand.kind
                    else {
                        return false;
                    };
                    **al == **up_to && ar.const_value().as_ref() == Some(a)
                }
            };
            operand_ok && self.is_length_call(rhs, recv, "length")
        });
        if !check0 {
            let msg = match adj {
                None => format!(
                    "could not prove ({} as u64) <= {}.length()",
                    up_to.str(self.tm),
                    recv.str(self.tm)
                ),
                Some(a) => format!(
                    "could not prove (({} + {}) as u64) <= {}.length()",
                    up_to.str(self.tm),
                    a,
                    recv.str(self.tm)
                ),
            };
            return Err(self.fail(ErrorKind::CannotProve, msg));
        }

        let check1 = self.facts.iter().any(|x| {
            let ExprKind::Binary {
                op: BinaryOp::Ge,
                lhs,
                rhs,
            } = &x.kind
            else {
                return false;
            };
            **lhs == **distance && rhs.const_value().is_some_and(|cv| cv >= *min_distance)
        });
        if !check1 {
            return Err(self.fail(
                ErrorKind::CannotProve,
                format!(
                    "could not prove {} >= {}",
                    distance.str(self.tm),
                    min_distance
                ),
            ));
        }

        let check2 = self.facts.iter().any(|x| {
            let ExprKind::Binary {
                op: BinaryOp::Le,
                lhs,
                rhs,
            } = &x.kind
            else {
                return false;
            };
            let ExprKind::As { operand, target } = &lhs.kind else {
                return false;
            };
            **operand == **distance
                && target.prim_kind() == Some(Prim::U64)
                && self.is_length_call(rhs, recv, "history_length")
        });
        if !check2 {
            return Err(self.fail(
                ErrorKind::CannotProve,
                format!(
                    "could not prove {} <= {}.history_length()",
                    distance.str(self.tm),
                    recv.str(self.tm)
                ),
            ));
        }

        Ok(())
    }

    fn is_length_call(&self, x: &Expr, recv: &Rc<Expr>, name: &str) -> bool {
        match x.is_method_call() {
            Some((r, m, a)) => a.is_empty() && **r == **recv && self.tm.name(m) == name,
            None => false,
        }
    }

    /// Proves `subject.length() >= advance` from the facts, then, for
    /// consuming methods, advances the position: length facts shrink by the
    /// advance and every other fact about the subject is dropped.
    pub(crate) fn optimize_io_method_advance(
        &mut self,
        subject: &Rc<Expr>,
        advance: Option<&BigInt>,
        advance_expr: Option<&Rc<Expr>>,
        update: bool,
    ) -> Result<bool, CheckError> {
        let length_call = rewrite::make_slice_length(self.tm, subject)?;

        let ok = if let Some(a) = advance {
            self.facts.iter().any(|x| {
                let Some((op, cv)) = parse_length_cmp(x, &length_call) else {
                    return false;
                };
                let lower = match op {
                    BinaryOp::Ge | BinaryOp::Eq => cv,
                    BinaryOp::Gt => cv + BigInt::one(),
                    _ => return false,
                };
                lower >= *a
            })
        } else if let Some(e) = advance_expr {
            self.facts.iter().any(|x| {
                let ExprKind::Binary { op, lhs, rhs } = &x.kind else {
                    return false;
                };
                let (small, big) = match op {
                    BinaryOp::Le => (lhs, rhs),
                    BinaryOp::Ge => (rhs, lhs),
                    _ => return false,
                };
                if **big != *length_call {
                    return false;
                }
                if **small == **e {
                    return true;
                }
                matches!(&small.kind, ExprKind::As { operand, target }
                    if **operand == **e && target.prim_kind() == Some(Prim::U64))
            })
        } else {
            false
        };
        if !ok {
            return Ok(false);
        }

        if update {
            trace!("io advance consumes from {}", subject.str(self.tm));
            match advance {
                Some(a) => {
                    let a = a.clone();
                    let lc = length_call.clone();
                    let subject_c = subject.clone();
                    let tm = &mut *self.tm;
                    self.facts.update(|x| {
                        if !x.mentions(&subject_c) {
                            return Ok(Some(x.clone()));
                        }
                        // The position moved: any non-length fact about the
                        // subject may be stale now, so only length
                        // comparisons are carried forward.
                        let Some((op, cv)) = parse_length_cmp(x, &lc) else {
                            return Ok(None);
                        };
                        if !matches!(op, BinaryOp::Ge | BinaryOp::Gt | BinaryOp::Eq) {
                            return Ok(None);
                        }
                        let k = cv - &a;
                        if k < BigInt::zero() {
                            return Ok(None);
                        }
                        let o = Expr::new(ExprKind::Binary {
                            op,
                            lhs: lc.clone(),
                            rhs: rewrite::make_const_value_expr(tm, &k),
                        });
                        o.set_mbounds(IntRange::new(BigInt::zero(), BigInt::one()));
                        o.set_mtype(rewrite::bool_type());
                        Ok(Some(o))
                    })?;
                }
                // A symbolic advance leaves no exact remainder to carry
                // forward.
                None => {
                    let subject_c = subject.clone();
                    self.facts.update(|x| {
                        Ok(if x.mentions(&subject_c) {
                            None
                        } else {
                            Some(x.clone())
                        })
                    })?;
                }
            }
        }

        Ok(true)
    }
}

// Canonicalizes "subject.length() OP const" in either orientation.
fn parse_length_cmp(x: &Expr, length_call: &Expr) -> Option<(BinaryOp, BigInt)> {
    let ExprKind::Binary { op, lhs, rhs } = &x.kind else {
        return None;
    };
    if !op.is_comparison() {
        return None;
    }
    if **lhs == *length_call {
        Some((*op, rhs.const_value()?))
    } else if **rhs == *length_call {
        Some((op.swap_comparison()?, lhs.const_value()?))
    } else {
        None
    }
}

// Byte advance per builtin I/O method, and whether the method consumes those
// bytes (writes do, peeks and pokes don't).
fn io_method_advance(name: &str) -> Option<(u64, bool)> {
    Some(match name {
        "peek_u8" | "peek_u8_as_u32" | "peek_u8_as_u64" => (1, false),
        "peek_u16be" | "peek_u16le" | "peek_u16be_as_u32" | "peek_u16le_as_u32"
        | "peek_u16be_as_u64" | "peek_u16le_as_u64" => (2, false),
        "peek_u24be_as_u32" | "peek_u24le_as_u32" | "peek_u24be_as_u64"
        | "peek_u24le_as_u64" => (3, false),
        "peek_u32be" | "peek_u32le" | "peek_u32be_as_u64" | "peek_u32le_as_u64" => (4, false),
        "peek_u40be_as_u64" | "peek_u40le_as_u64" => (5, false),
        "peek_u48be_as_u64" | "peek_u48le_as_u64" => (6, false),
        "peek_u56be_as_u64" | "peek_u56le_as_u64" => (7, false),
        "peek_u64be" | "peek_u64le" => (8, false),

        "poke_u8" => (1, false),
        "poke_u16be" | "poke_u16le" => (2, false),
        "poke_u24be" | "poke_u24le" => (3, false),
        "poke_u32be" | "poke_u32le" => (4, false),
        "poke_u40be" | "poke_u40le" => (5, false),
        "poke_u48be" | "poke_u48le" => (6, false),
        "poke_u56be" | "poke_u56le" => (7, false),
        "poke_u64be" | "poke_u64le" => (8, false),

        "write_u8_fast" => (1, true),
        "write_u16be_fast" | "write_u16le_fast" => (2, true),
        "write_u24be_fast" | "write_u24le_fast" => (3, true),
        "write_u32be_fast" | "write_u32le_fast" => (4, true),
        "write_u40be_fast" | "write_u40le_fast" => (5, true),
        "write_u48be_fast" | "write_u48le_fast" => (6, true),
        "write_u56be_fast" | "write_u56le_fast" => (7, true),
        "write_u64be_fast" | "write_u64le_fast" => (8, true),

        "write_simple_token_fast" | "write_extended_token_fast" => (1, true),

        _ => return None,
    })
}

// 64 bits is 8 bytes, and so on up the vector widths.
fn cpu_arch_advance(name: &str) -> Option<u64> {
    Some(if name.ends_with("_slice64") {
        8
    } else if name.ends_with("_slice128") {
        16
    } else if name.ends_with("_slice256") {
        32
    } else if name.ends_with("_slice512") {
        64
    } else {
        return None;
    })
}
