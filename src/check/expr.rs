//! Expression checking: each node's interval is derived from operator
//! semantics and child intervals, refined by the current facts, and required
//! to stay inside the node's declared type bounds. The result is cached on
//! the node, so re-checking an annotated subtree is a lookup.

use super::*;

use crate::ast::{max_ideal, min_ideal, AssignOp, BinaryOp, ExprKind, TypeKind, UnaryOp};
use crate::interval::{bit_mask, IntRange};
use num_traits::{One, Signed, Zero};

impl Checker<'_> {
    pub(crate) fn bcheck_expr(&mut self, n: &Rc<Expr>, depth: u32) -> Result<IntRange, CheckError> {
        if depth > MAX_EXPR_DEPTH {
            return Err(self.fail(
                ErrorKind::Structural,
                "expression recursion depth too large",
            ));
        }
        let depth = depth + 1;

        if let Some(b) = n.mbounds() {
            return Ok(b);
        }
        if n.const_value().is_some() {
            return self.bcheck_expr_const_value(n);
        }

        let nb = self.bcheck_expr1(n, depth)?;
        let nb = self.facts.refine(n, nb, self.tm)?;
        let typ = self.mtype_of(n)?;
        let tb = self.bcheck_type_expr(&typ)?;
        if nb.min < tb.min || nb.max > tb.max {
            return Err(self.fail(
                ErrorKind::OutOfBounds,
                format!(
                    "expression {:?} bounds {} is not within bounds {}",
                    n.str(self.tm),
                    nb,
                    tb
                ),
            ));
        }
        n.set_mbounds(nb.clone());
        Ok(nb)
    }

    // A constant expression's bounds are the constant itself; children are
    // visited so literal subtrees get their annotations too.
    fn bcheck_expr_const_value(&mut self, n: &Rc<Expr>) -> Result<IntRange, CheckError> {
        let children: Vec<Rc<Expr>> = n.children().into_iter().cloned().collect();
        for child in &children {
            self.bcheck_expr_const_value(child)?;
        }
        let cv = n.const_value().ok_or_else(|| {
            self.fail(
                ErrorKind::Internal,
                "constant expression has no constant value",
            )
        })?;
        let b = IntRange::single(&cv);
        n.set_mbounds(b.clone());
        Ok(b)
    }

    fn bcheck_expr1(&mut self, n: &Rc<Expr>, depth: u32) -> Result<IntRange, CheckError> {
        match &n.kind {
            ExprKind::Unary { .. } => self.bcheck_expr_unary(n, depth),
            ExprKind::Binary { op, lhs, rhs } => {
                let (op, lhs, rhs) = (*op, lhs.clone(), rhs.clone());
                self.bcheck_expr_binary_op(op, &lhs, &rhs, depth)
            }
            // The type conversion is checked against the target type by the
            // enclosing bcheck_expr; the value itself passes through.
            ExprKind::As { operand, .. } => {
                let operand = operand.clone();
                self.bcheck_expr(&operand, depth)
            }
            ExprKind::Assoc { .. } => self.bcheck_expr_assoc(n, depth),
            _ => self.bcheck_expr_other(n, depth),
        }
    }

    fn bcheck_expr_unary(&mut self, n: &Rc<Expr>, depth: u32) -> Result<IntRange, CheckError> {
        let ExprKind::Unary { op, operand } = &n.kind else {
            return Err(self.fail(ErrorKind::Internal, "expected unary expression"));
        };
        let (op, operand) = (*op, operand.clone());
        let rb = self.bcheck_expr(&operand, depth)?;
        Ok(match op {
            UnaryOp::Pos => rb,
            UnaryOp::Neg => IntRange::new(-rb.max, -rb.min),
            UnaryOp::Not => IntRange::new(BigInt::zero(), BigInt::one()),
        })
    }

    pub(crate) fn bcheck_expr_binary_op(
        &mut self,
        op: BinaryOp,
        lhs: &Rc<Expr>,
        rhs: &Rc<Expr>,
        depth: u32,
    ) -> Result<IntRange, CheckError> {
        let lb = self.bcheck_expr(lhs, depth)?;
        self.bcheck_expr_binary_op1(op, lhs, lb, rhs, depth)
    }

    pub(crate) fn bcheck_expr_binary_op1(
        &mut self,
        op: BinaryOp,
        lhs: &Rc<Expr>,
        lb: IntRange,
        rhs: &Rc<Expr>,
        depth: u32,
    ) -> Result<IntRange, CheckError> {
        let rb = self.bcheck_expr(rhs, depth)?;

        match op {
            BinaryOp::Add => Ok(lb.add(&rb)),

            BinaryOp::Sub => Ok(self.bcheck_expr_sub(lhs, &lb, rhs, &rb)),

            BinaryOp::Mul => Ok(lb.mul(&rb)),

            BinaryOp::Div | BinaryOp::Mod => {
                // Division by a possibly-zero or negative operand is never
                // provable at runtime, so it is rejected outright.
                if lb.min.is_negative() {
                    return Err(self.fail(
                        ErrorKind::IllegalArgument,
                        format!(
                            "divide/modulus op argument {:?} is possibly negative",
                            lhs.str(self.tm)
                        ),
                    ));
                }
                if rb.min <= BigInt::zero() {
                    return Err(self.fail(
                        ErrorKind::IllegalArgument,
                        format!(
                            "divide/modulus op argument {:?} is possibly non-positive",
                            rhs.str(self.tm)
                        ),
                    ));
                }
                if op == BinaryOp::Div {
                    lb.try_quo(&rb).ok_or_else(|| {
                        self.fail(ErrorKind::Internal, "quotient of checked operands failed")
                    })
                } else {
                    Ok(IntRange::new(BigInt::zero(), rb.max - BigInt::one()))
                }
            }

            BinaryOp::Shl | BinaryOp::ModShl | BinaryOp::Shr => {
                let l_typ = self.mtype_of(lhs)?;
                let prim = l_typ.prim_kind().filter(|p| p.is_unsigned());
                let Some(width) = prim.and_then(|p| p.bit_width()) else {
                    return Err(self.fail(
                        ErrorKind::IllegalArgument,
                        format!(
                            "shift op argument {:?} of type {:?} does not have unsigned integer type",
                            lhs.str(self.tm),
                            l_typ.str(self.tm)
                        ),
                    ));
                };
                let shift_bounds =
                    IntRange::new(BigInt::zero(), BigInt::from(width) - BigInt::one());
                if !shift_bounds.contains_int_range(&rb) {
                    return Err(self.fail(
                        ErrorKind::IllegalArgument,
                        format!(
                            "shift op argument {:?} is outside the range {}",
                            rhs.str(self.tm),
                            shift_bounds
                        ),
                    ));
                }

                match op {
                    BinaryOp::Shl => lb.try_lsh(&rb).ok_or_else(|| {
                        self.fail(ErrorKind::Internal, "shift of checked operands failed")
                    }),
                    BinaryOp::ModShl => {
                        let mut nb = lb.try_lsh(&rb).ok_or_else(|| {
                            self.fail(ErrorKind::Internal, "shift of checked operands failed")
                        })?;
                        let type_max = bit_mask(width);
                        if nb.max > type_max {
                            nb.max = type_max;
                        }
                        Ok(nb)
                    }
                    _ => lb.try_rsh(&rb).ok_or_else(|| {
                        self.fail(ErrorKind::Internal, "shift of checked operands failed")
                    }),
                }
            }

            BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor => {
                if lb.min.is_negative() {
                    return Err(self.fail(
                        ErrorKind::IllegalArgument,
                        format!(
                            "bitwise op argument {:?} is possibly negative",
                            lhs.str(self.tm)
                        ),
                    ));
                }
                if rb.min.is_negative() {
                    return Err(self.fail(
                        ErrorKind::IllegalArgument,
                        format!(
                            "bitwise op argument {:?} is possibly negative",
                            rhs.str(self.tm)
                        ),
                    ));
                }
                match op {
                    BinaryOp::BitAnd => Ok(lb.and(&rb)),
                    BinaryOp::BitOr => Ok(lb.or(&rb)),
                    // Round the maximum up to a power-of-two mask. This is
                    // conservative but works fine in practice.
                    _ => {
                        let z = lb.max.max(rb.max);
                        Ok(IntRange::new(BigInt::zero(), bit_mask(z.bits())))
                    }
                }
            }

            BinaryOp::ModAdd | BinaryOp::ModSub | BinaryOp::ModMul => {
                let b = self.concrete_operand_range(lhs, rhs)?;
                Ok(b)
            }

            BinaryOp::SatAdd | BinaryOp::SatSub => {
                let b = self.concrete_operand_range(lhs, rhs)?;
                let mut nb = if op == BinaryOp::SatAdd {
                    lb.add(&rb)
                } else {
                    self.bcheck_expr_sub(lhs, &lb, rhs, &rb)
                };
                if op == BinaryOp::SatAdd {
                    nb.min = nb.min.min(b.max.clone());
                    nb.max = nb.max.min(b.max);
                } else {
                    nb.min = nb.min.max(b.min.clone());
                    nb.max = nb.max.max(b.min);
                }
                Ok(nb)
            }

            BinaryOp::Eq
            | BinaryOp::Ne
            | BinaryOp::Lt
            | BinaryOp::Le
            | BinaryOp::Ge
            | BinaryOp::Gt
            | BinaryOp::And
            | BinaryOp::Or => Ok(IntRange::new(BigInt::zero(), BigInt::one())),
        }
    }

    // The intrinsic range of the operands' concrete integer type; an ideal
    // LHS defers to the RHS type.
    fn concrete_operand_range(
        &mut self,
        lhs: &Rc<Expr>,
        rhs: &Rc<Expr>,
    ) -> Result<IntRange, CheckError> {
        let mut typ = self.mtype_of(lhs)?;
        if typ.is_ideal() {
            typ = self.mtype_of(rhs)?;
        }
        match typ.prim_kind().and_then(intrinsic_prim_range) {
            Some(b) => Ok(b),
            None => Err(self.fail(
                ErrorKind::IllegalArgument,
                format!(
                    "modular/saturating op operand {:?} does not have a concrete integer type",
                    lhs.str(self.tm)
                ),
            )),
        }
    }

    // "lhs - rhs", tightened by any fact comparing the same two operands.
    fn bcheck_expr_sub(
        &mut self,
        lhs: &Rc<Expr>,
        lb: &IntRange,
        rhs: &Rc<Expr>,
        rb: &IntRange,
    ) -> IntRange {
        let mut nb = lb.sub(rb);
        for x in self.facts.iter() {
            let ExprKind::Binary {
                op,
                lhs: fl,
                rhs: fr,
            } = &x.kind
            else {
                continue;
            };
            if **fl != **lhs || **fr != **rhs {
                continue;
            }
            match op {
                BinaryOp::Lt => nb.max = nb.max.min(-BigInt::one()),
                BinaryOp::Le => nb.max = nb.max.min(BigInt::zero()),
                BinaryOp::Ge => nb.min = nb.min.max(BigInt::zero()),
                BinaryOp::Gt => nb.min = nb.min.max(BigInt::one()),
                _ => {}
            }
        }
        nb
    }

    fn bcheck_expr_assoc(&mut self, n: &Rc<Expr>, depth: u32) -> Result<IntRange, CheckError> {
        let ExprKind::Assoc { op, args } = &n.kind else {
            return Err(self.fail(ErrorKind::Internal, "expected associative expression"));
        };
        let (op, args) = (*op, args.clone());
        if args.is_empty() {
            return Err(self.fail(
                ErrorKind::Structural,
                "associative op has no arguments",
            ));
        }
        let n_typ = n.mtype();
        let mut lb = self.bcheck_expr(&args[0], depth)?;
        for i in 1..args.len() {
            // The accumulated prefix stands in as the LHS operand so fact
            // matching sees the same shape the programmer wrote.
            let prefix = Expr::new(ExprKind::Assoc {
                op,
                args: args[..i].to_vec(),
            });
            if let Some(t) = &n_typ {
                prefix.set_mtype(t.clone());
            }
            lb = self.bcheck_expr_binary_op1(op.binary_form(), &prefix, lb, &args[i], depth)?;
        }
        Ok(lb)
    }

    fn bcheck_expr_other(&mut self, n: &Rc<Expr>, depth: u32) -> Result<IntRange, CheckError> {
        match &n.kind {
            ExprKind::Ident(id) => {
                // Named consts pin the range to their value.
                if let Some(c) = self.consts.get(id) {
                    if let Some(cv) = c.value.const_value() {
                        return Ok(IntRange::single(&cv));
                    }
                }
            }

            ExprKind::Call { callee, .. } => {
                let callee = callee.clone();
                self.bcheck_expr(&callee, depth)?;
                self.bcheck_expr_call(n, depth)?;
                if let Some(nb) = self.bcheck_expr_call_special_cases(n, depth)? {
                    return Ok(nb);
                }
            }

            ExprKind::Index { lhs, index } => {
                let (lhs, index) = (lhs.clone(), index.clone());
                self.bcheck_expr(&lhs, depth)?;
                self.bcheck_expr(&index, depth)?;

                let length_expr = self.length_expr_of(&lhs)?;
                let zero = self.zero_expr.clone();
                self.prove_reason_requirement(BinaryOp::Le, &zero, &index)?;
                self.prove_reason_requirement(BinaryOp::Lt, &index, &length_expr)?;
            }

            ExprKind::Slice { lhs, from, to } => {
                let (lhs, from, to) = (lhs.clone(), from.clone(), to.clone());
                self.bcheck_expr(&lhs, depth)?;
                if let Some(from) = &from {
                    self.bcheck_expr(from, depth)?;
                }
                if let Some(to) = &to {
                    self.bcheck_expr(to, depth)?;
                }

                if from.is_none() && to.is_none() {
                    return Ok(IntRange::new(BigInt::zero(), BigInt::zero()));
                }

                let length_expr = self.length_expr_of(&lhs)?;
                let lo = from.clone().unwrap_or_else(|| self.zero_expr.clone());
                let hi = to.clone().unwrap_or_else(|| length_expr.clone());

                // Obligations that are trivially true for the defaults are
                // skipped.
                if from.is_some() {
                    let zero = self.zero_expr.clone();
                    self.prove_reason_requirement(BinaryOp::Le, &zero, &lo)?;
                }
                self.prove_reason_requirement(BinaryOp::Le, &lo, &hi)?;
                if to.is_some() {
                    self.prove_reason_requirement(BinaryOp::Le, &hi, &length_expr)?;
                }
            }

            ExprKind::Selector { lhs, field } => {
                let (lhs, field) = (lhs.clone(), *field);
                self.bcheck_expr(&lhs, depth)?;

                // A field of the implicit argument record reads the declared
                // in-field's type.
                if lhs.as_ident().is_some() && lhs == self.args_expr {
                    let func = self.func.clone();
                    for o in &func.in_fields {
                        if o.name == field {
                            let xtype = o.xtype.clone();
                            return self.bcheck_type_expr(&xtype);
                        }
                    }
                    return Err(self.fail(
                        ErrorKind::Structural,
                        format!(
                            "no field named {:?} found for expression {:?}",
                            self.tm.name(field),
                            n.str(self.tm)
                        ),
                    ));
                }
            }

            ExprKind::List { args } => {
                let args = args.clone();
                for o in &args {
                    self.bcheck_expr(o, depth)?;
                }
            }

            ExprKind::Unary { .. }
            | ExprKind::Binary { .. }
            | ExprKind::As { .. }
            | ExprKind::Assoc { .. } => {
                return Err(self.fail(
                    ErrorKind::Internal,
                    "operator expression routed to bcheck_expr_other",
                ));
            }
        }

        let typ = self.mtype_of(n)?;
        self.bcheck_type_expr(&typ)
    }

    // "a[i]" and "a[i .. j]" measure against the array's static length or a
    // synthetic "a.length()" call for slices.
    fn length_expr_of(&mut self, lhs: &Rc<Expr>) -> Result<Rc<Expr>, CheckError> {
        let l_typ = self.mtype_of(lhs)?;
        if let Some(length) = l_typ.array_length() {
            return Ok(length.clone());
        }
        rewrite::make_slice_length(self.tm, lhs)
    }

    // Arguments are checked against the declared parameter types; a call
    // through a nullable-pointer receiver additionally needs a fact that the
    // receiver is non-null.
    fn bcheck_expr_call(&mut self, n: &Rc<Expr>, depth: u32) -> Result<(), CheckError> {
        let ExprKind::Call { callee, args } = &n.kind else {
            return Err(self.fail(ErrorKind::Internal, "expected call expression"));
        };
        let (callee, args) = (callee.clone(), args.clone());

        let c_typ = self.mtype_of(&callee)?;
        let decl = c_typ
            .func_name()
            .and_then(|id| self.funcs.get(&id))
            .cloned();
        match decl {
            Some(f) => {
                if f.in_fields.len() != args.len() {
                    return Err(self.fail(
                        ErrorKind::Structural,
                        format!(
                            "{:?} has {} arguments but {} were given",
                            c_typ.str(self.tm),
                            f.in_fields.len(),
                            args.len()
                        ),
                    ));
                }
                for (field, arg) in f.in_fields.iter().zip(&args) {
                    self.bcheck_assignment1(None, Some(&field.xtype), AssignOp::Eq, arg)?;
                }
            }
            // Builtin methods have no declaration; their argument constraints
            // come from the special-case rules.
            None => {
                for arg in &args {
                    self.bcheck_expr(arg, depth)?;
                }
            }
        }

        if let ExprKind::Selector { lhs: recv, .. } = &callee.kind {
            let recv = recv.clone();
            let r_typ = self.mtype_of(&recv)?;
            if r_typ.is_nptr_type() {
                let proven = self.facts.iter().any(|x| {
                    let ExprKind::Binary {
                        op: BinaryOp::Ne,
                        lhs,
                        rhs,
                    } = &x.kind
                    else {
                        return false;
                    };
                    (**lhs == *self.nullptr_expr && **rhs == *recv)
                        || (**rhs == *self.nullptr_expr && **lhs == *recv)
                });
                if !proven {
                    return Err(self.fail(
                        ErrorKind::CannotProve,
                        format!("cannot prove {:?}", recv.str(self.tm) + " != nullptr"),
                    ));
                }
            }
        }
        Ok(())
    }

    pub(crate) fn bcheck_type_expr(
        &mut self,
        typ: &Rc<TypeExpr>,
    ) -> Result<IntRange, CheckError> {
        if let Some(b) = typ.mbounds() {
            return Ok(b);
        }
        let b = self.bcheck_type_expr1(typ)?;
        typ.set_mbounds(b.clone());
        Ok(b)
    }

    fn bcheck_type_expr1(&mut self, typ: &Rc<TypeExpr>) -> Result<IntRange, CheckError> {
        if let Some(inner) = typ.inner() {
            let inner = inner.clone();
            self.bcheck_type_expr(&inner)?;
        }

        match &typ.kind {
            TypeKind::Array { length, .. } => {
                let length = length.clone();
                self.bcheck_expr(&length, 0)?;
                Ok(IntRange::new(BigInt::zero(), BigInt::zero()))
            }
            TypeKind::Slice { .. } | TypeKind::Table { .. } => {
                Ok(IntRange::new(BigInt::zero(), BigInt::zero()))
            }
            TypeKind::Ptr { .. } => Ok(IntRange::new(BigInt::one(), BigInt::one())),
            TypeKind::Nptr { .. } => Ok(IntRange::new(BigInt::zero(), BigInt::one())),
            TypeKind::Func { receiver, .. } => {
                let receiver = receiver.clone();
                self.bcheck_type_expr(&receiver)?;
                Ok(IntRange::new(BigInt::one(), BigInt::one()))
            }
            TypeKind::Prim { prim, min, max } => {
                let (prim, min, max) = (*prim, min.clone(), max.clone());
                let mut b = intrinsic_prim_range(prim)
                    .unwrap_or_else(|| IntRange::new(BigInt::zero(), BigInt::zero()));

                if let Some(x) = &min {
                    self.bcheck_expr(x, 0)?;
                    let cv = x.const_value().ok_or_else(|| {
                        self.fail(ErrorKind::Internal, "type refinement has no constant value")
                    })?;
                    if cv < b.min {
                        return Err(self.refinement_out_of_bounds(&cv, typ));
                    }
                    b.min = cv;
                }
                if let Some(x) = &max {
                    self.bcheck_expr(x, 0)?;
                    let cv = x.const_value().ok_or_else(|| {
                        self.fail(ErrorKind::Internal, "type refinement has no constant value")
                    })?;
                    if cv > b.max {
                        return Err(self.refinement_out_of_bounds(&cv, typ));
                    }
                    b.max = cv;
                }
                Ok(b)
            }
        }
    }

    fn refinement_out_of_bounds(&self, cv: &BigInt, typ: &Rc<TypeExpr>) -> CheckError {
        self.fail(
            ErrorKind::OutOfBounds,
            format!(
                "type refinement {} for {:?} is out of bounds",
                cv,
                typ.str(self.tm)
            ),
        )
    }
}

fn intrinsic_prim_range(prim: Prim) -> Option<IntRange> {
    if let Some(width) = prim.bit_width() {
        return Some(if prim.is_unsigned() {
            IntRange::new(BigInt::zero(), bit_mask(width))
        } else {
            IntRange::new(-(BigInt::one() << (width - 1)), bit_mask(width - 1))
        });
    }
    match prim {
        Prim::Bool => Some(IntRange::new(BigInt::zero(), BigInt::one())),
        Prim::Ideal => Some(IntRange::new(min_ideal(), max_ideal())),
        _ => None,
    }
}
