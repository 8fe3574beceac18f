//! Statement checking: Hoare-style rules per statement kind. Linear
//! sequences extend the fact store, branches snapshot and unify it, loops
//! clear it at their pre/inv/post boundaries, and impure calls invalidate
//! facts that may not survive the call.

use super::*;

use std::collections::HashSet;

use crate::ast::{
    terminates, Assign, AssignOp, AssertKind, BinaryOp, ExprKind, If, Iterate, JumpKind, RetKind,
    Stmt, While,
};
use crate::interval::IntRange;
use log::trace;
use num_traits::{One, Zero};

impl Checker<'_> {
    pub(crate) fn bcheck_block(&mut self, block: &[Stmt]) -> Result<(), CheckError> {
        let mut unreachable = false;
        for o in block {
            self.err_line = o.line();
            if unreachable {
                return Err(self.fail(ErrorKind::Structural, "unreachable code"));
            }
            self.bcheck_statement(o)?;

            match o {
                Stmt::Jump(_) => {}
                Stmt::Ret(n) => {
                    // A yield suspends and resumes: the block stays live, but
                    // facts about caller-visible state are gone.
                    if n.keyword == RetKind::Yield {
                        self.update_facts_for_suspension()?;
                        continue;
                    }
                }
                _ => continue,
            }
            unreachable = true;
        }
        Ok(())
    }

    fn bcheck_statement(&mut self, o: &Stmt) -> Result<(), CheckError> {
        match o {
            Stmt::Assert(n) => self.bcheck_assert(&n.clone()),

            Stmt::Assign(n) => {
                let n = n.clone();
                self.bcheck_assignment(n.lhs.as_ref(), n.op, &n.rhs)
            }

            Stmt::If(n) => self.bcheck_if(n.clone()),

            Stmt::While(n) => self.bcheck_while(&n.clone()),

            Stmt::Iterate(n) => self.bcheck_iterate(n.clone()),

            Stmt::IoBind(n) => {
                let n = n.clone();
                self.bcheck_expr(&n.io, 0)?;
                self.bcheck_expr(&n.arg1, 0)?;
                self.bcheck_block(&n.body)?;
                // Facts mentioning the rebound streams survive; invalidating
                // them here is a known gap.
                Ok(())
            }

            Stmt::Jump(n) => {
                let n = n.clone();
                let target = n.target.upgrade().ok_or_else(|| {
                    self.fail(ErrorKind::Internal, "jump target is no longer alive")
                })?;
                let asserts = target.asserts.clone();
                for o in &asserts {
                    let discharge = match n.keyword {
                        JumpKind::Continue => o.keyword != AssertKind::Post,
                        JumpKind::Break => o.keyword == AssertKind::Post,
                    };
                    if discharge {
                        self.bcheck_assert(o)?;
                    }
                }
                self.facts.clear();
                Ok(())
            }

            Stmt::Ret(n) => self.bcheck_ret(&n.clone()),

            Stmt::Var(n) => {
                let n = n.clone();
                self.bcheck_type_expr(&n.xtype)?;
                // "var x T" has an implicit "= 0".
                let lhs = Expr::ident(n.name);
                lhs.set_mtype(n.xtype.clone());
                let rhs = self.zero_expr.clone();
                self.bcheck_assignment(Some(&lhs), AssignOp::Eq, &rhs)
            }
        }
    }

    fn bcheck_ret(&mut self, n: &Rc<crate::ast::Ret>) -> Result<(), CheckError> {
        let func = self.func.clone();
        let l_typ = if func.effect.is_coroutine() {
            TypeExpr::prim(Prim::Status)
        } else if let Some(out) = &func.out {
            out.clone()
        } else {
            TypeExpr::prim(Prim::EmptyStruct)
        };
        self.bcheck_assignment1(None, Some(&l_typ), AssignOp::Eq, &n.value)?;

        if l_typ.is_status() {
            let id = match &n.value.kind {
                ExprKind::Ident(id) => Some(*id),
                ExprKind::Selector { field, .. } => Some(*field),
                _ => None,
            };
            if let Some(id) = id {
                let name = self.tm.name(id).to_string();
                if name != "ok" && (self.has_is_error_fact(id) || is_error_status(&name)) {
                    n.set_rets_error();
                }
            }
        }
        Ok(())
    }

    fn update_facts_for_suspension(&mut self) -> Result<(), CheckError> {
        let args_expr = self.args_expr.clone();
        let this_expr = self.this_expr.clone();
        self.facts.update(|x| {
            if x.mentions(&args_expr) || x.mentions(&this_expr) {
                return Ok(None);
            }
            Ok(Some(x.clone()))
        })
    }

    fn bcheck_if(&mut self, n: Rc<If>) -> Result<(), CheckError> {
        let mut branches: Vec<Vec<Rc<Expr>>> = Vec::new();
        let mut node = n;
        loop {
            let snap = self.facts.snapshot();

            self.bcheck_expr(&node.condition, 0)?;

            // Check the if-true branch, assuming the if condition.
            if node.condition.const_value().is_none() {
                self.facts.append_fact(node.condition.clone());
            }
            self.bcheck_block(&node.body_if_true)?;
            if !terminates(&node.body_if_true) {
                branches.push(self.facts.snapshot());
            }

            // Check the if-false branch, assuming the inverted condition.
            self.facts.restore(snap);
            if node.condition.const_value().is_none() {
                let inverse = invert(self.tm, &node.condition)?;
                self.facts.append_fact(inverse);
            }
            if !node.body_if_false.is_empty() {
                self.bcheck_block(&node.body_if_false)?;
                if !terminates(&node.body_if_false) {
                    branches.push(self.facts.snapshot());
                }
                break;
            }
            match node.else_if.clone() {
                Some(e) => node = e,
                None => {
                    branches.push(self.facts.snapshot());
                    break;
                }
            }
        }
        self.unify(branches)
    }

    // Keep only the facts present, by canonical source form, in every
    // non-terminating branch.
    fn unify(&mut self, branches: Vec<Vec<Rc<Expr>>>) -> Result<(), CheckError> {
        self.facts.clear();
        let Some(first) = branches.first() else {
            return Ok(());
        };
        self.facts.restore(first.clone());
        if branches.len() == 1 {
            return Ok(());
        }
        if branches.len() > MAX_IF_BRANCHES {
            return Err(self.fail(ErrorKind::Structural, "too many if-else branches"));
        }

        let mut m: HashMap<String, usize> = HashMap::new();
        {
            let tm = &*self.tm;
            for b in &branches {
                for f in b {
                    *m.entry(f.str(tm)).or_default() += 1;
                }
            }
        }
        let total = branches.len();
        let tm = &*self.tm;
        self.facts.update(|x| {
            if m.get(&x.str(tm)) == Some(&total) {
                Ok(Some(x.clone()))
            } else {
                Ok(None)
            }
        })
    }

    fn bcheck_while(&mut self, n: &Rc<While>) -> Result<(), CheckError> {
        let asserts = n.asserts.clone();

        // Prove the pre and inv conditions on entry.
        for o in &asserts {
            if o.keyword != AssertKind::Post {
                self.bcheck_assert(o)?;
            }
        }

        self.bcheck_expr(&n.condition, 0)?;
        let cv = n.condition.const_value();

        // Prove the post conditions on natural exit, assuming only pre, inv
        // and the inverted condition. A "while true" loop has no natural
        // exit, so there is nothing to prove there.
        //
        // The inv conditions don't need re-proving here: they held on entry
        // and are re-proven on every continue.
        if cv.as_ref().is_some_and(|v| v.is_one()) {
            // No-op.
        } else {
            self.facts.clear();
            for o in &asserts {
                if o.keyword != AssertKind::Post {
                    self.facts.append_fact(o.condition.clone());
                }
            }
            if cv.is_none() {
                let inverse = invert(self.tm, &n.condition)?;
                self.facts.append_fact(inverse);
            }
            for o in &asserts {
                if o.keyword == AssertKind::Post {
                    self.bcheck_assert(o)?;
                }
            }
        }

        // Check the body under pre, inv and the condition; a "while false"
        // body never runs.
        if cv.as_ref().is_some_and(|v| v.is_zero()) {
            // No-op.
        } else {
            self.facts.clear();
            for o in &asserts {
                if o.keyword != AssertKind::Post {
                    self.facts.append_fact(o.condition.clone());
                }
            }
            if cv.is_none() {
                self.facts.append_fact(n.condition.clone());
            }
            self.bcheck_block(&n.body)?;

            // The implicit continue after the body re-establishes pre and
            // inv.
            if !terminates(&n.body) {
                for o in &asserts {
                    if o.keyword != AssertKind::Post {
                        self.bcheck_assert(o)?;
                    }
                }
            }
        }

        // After the loop, assume the inv and post conditions.
        self.facts.clear();
        for o in &asserts {
            if o.keyword != AssertKind::Pre {
                self.facts.append_fact(o.condition.clone());
            }
        }
        Ok(())
    }

    // Each iterate variant gets a single-pass body check under only the
    // iteration variables' length equalities. This is deliberately weaker
    // than the while discipline: there is no inductive invariant support.
    fn bcheck_iterate(&mut self, n: Rc<Iterate>) -> Result<(), CheckError> {
        self.bcheck_expr(&n.unroll, 0)?;
        let assigns: Vec<Rc<Assign>> = n.assigns.clone();
        for o in &assigns {
            self.bcheck_assignment(o.lhs.as_ref(), o.op, &o.rhs)?;
        }

        let mut cur = Some(n);
        while let Some(node) = cur {
            self.bcheck_expr(&node.unroll, 0)?;
            self.facts.clear();
            for o in &assigns {
                let lhs = o.lhs.as_ref().ok_or_else(|| {
                    self.fail(ErrorKind::Internal, "iterate assignment has no LHS")
                })?;
                let name = lhs.as_ident().ok_or_else(|| {
                    self.fail(ErrorKind::Internal, "iterate variable is not an identifier")
                })?;
                let lhs_expr = Expr::ident(name);
                lhs_expr.set_mtype(self.mtype_of(lhs)?);
                let fact =
                    rewrite::make_slice_length_eq(self.tm, &lhs_expr, &BigInt::from(node.length))?;
                self.facts.append_fact(fact);
            }
            self.bcheck_block(&node.body)?;
            cur = node.else_iterate.clone();
        }

        self.facts.clear();
        Ok(())
    }

    pub(crate) fn bcheck_assignment(
        &mut self,
        lhs: Option<&Rc<Expr>>,
        op: AssignOp,
        rhs: &Rc<Expr>,
    ) -> Result<(), CheckError> {
        let rhs_is_impure_call =
            matches!(rhs.kind, ExprKind::Call { .. }) && rhs.effect.is_impure();
        let old_facts: Option<HashSet<*const Expr>> = if rhs_is_impure_call {
            Some(self.facts.iter().map(Rc::as_ptr).collect())
        } else {
            None
        };

        let mut l_typ = None;
        if let Some(lhs) = lhs {
            self.bcheck_expr(lhs, 0)?;
            l_typ = Some(self.mtype_of(lhs)?);
        }

        let nb = self.bcheck_assignment1(lhs, l_typ.as_ref(), op, rhs)?;

        if rhs_is_impure_call {
            // A non-interrogating coroutine call is a suspension point.
            if rhs.effect.is_coroutine() && op != AssignOp::EqQuestion {
                self.update_facts_for_suspension()?;
            }

            let recv = rhs.is_method_call().map(|(r, _, _)| r.clone());
            let call_args: Vec<Rc<Expr>> = match &rhs.kind {
                ExprKind::Call { args, .. } => args.clone(),
                _ => Vec::new(),
            };
            let mut ref_args = Vec::new();
            for arg in &call_args {
                let typ = self.mtype_of(arg)?;
                if typ.is_bool()
                    || typ.is_nullptr()
                    || typ.is_num_type_or_ideal()
                    || typ.is_status()
                {
                    continue;
                }
                ref_args.push(arg.clone());
            }

            let old = old_facts.unwrap_or_default();
            let dropped_before = self.facts.len();
            self.facts.update(|x| {
                // Facts minted since the snapshot describe the call's own
                // results and survive.
                if !old.contains(&Rc::as_ptr(x)) {
                    return Ok(Some(x.clone()));
                }
                if let Some(recv) = &recv {
                    if x.mentions(recv) {
                        return Ok(None);
                    }
                }
                for v in &ref_args {
                    if x.mentions(v) {
                        return Ok(None);
                    }
                }
                Ok(Some(x.clone()))
            })?;
            if self.facts.len() < dropped_before {
                trace!(
                    "impure call invalidated {} fact(s)",
                    dropped_before - self.facts.len()
                );
            }
        }

        let Some(lhs) = lhs else {
            return Ok(());
        };
        let l_typ = l_typ.ok_or_else(|| {
            self.fail(ErrorKind::Internal, "assignment LHS has no resolved type")
        })?;

        if op == AssignOp::Eq {
            // The old value is gone; so is everything known about it.
            let lhs_c = lhs.clone();
            self.facts
                .update(|x| Ok(if x.mentions(&lhs_c) { None } else { Some(x.clone()) }))?;

            if l_typ.is_num_type() && rhs.effect.is_pure() {
                self.facts
                    .append_binary_op_fact(BinaryOp::Eq, lhs.clone(), rhs.clone());

                if let Some((recv, method, margs)) = rhs.is_method_call() {
                    let (recv, margs) = (recv.clone(), margs.to_vec());
                    let numeric_recv = recv.mtype().is_some_and(|t| t.is_num_type());
                    if numeric_recv {
                        let method_name = self.tm.name(method).to_string();
                        let minted_op = match method_name.as_str() {
                            "max" => Some(BinaryOp::Ge),
                            "min" => Some(BinaryOp::Le),
                            _ => None,
                        };
                        if let Some(minted_op) = minted_op {
                            if margs.len() != 1 {
                                return Err(self.fail(
                                    ErrorKind::Internal,
                                    "max/min has unexpected arguments",
                                ));
                            }
                            for operand in [&recv, &margs[0]] {
                                if operand.mentions(lhs) {
                                    continue;
                                }
                                self.facts.append_binary_op_fact(
                                    minted_op,
                                    lhs.clone(),
                                    operand.clone(),
                                );
                            }
                        }
                    }
                }
            }

            // "lhs = x[i .. j]" with constant i and j fixes lhs.length().
            if let Some((_, from, to)) = rhs.is_slice() {
                let icv = match from {
                    None => Some(BigInt::zero()),
                    Some(i) => i.const_value(),
                };
                let jcv = to.and_then(|j| j.const_value());
                if let (Some(icv), Some(jcv)) = (icv, jcv) {
                    let fact = rewrite::make_slice_length_eq(self.tm, lhs, &(jcv - icv))?;
                    self.facts.append_fact(fact);
                }
            }
        } else {
            // A compound assignment shifts what is known about lhs: for
            // "lhs += rhs", "lhs < k" becomes "lhs < (k + rhs)".
            let lhs_c = lhs.clone();
            let rhs_c = rhs.clone();
            let tm = &mut *self.tm;
            self.facts.update(|x| {
                let ExprKind::Binary {
                    op: xop,
                    lhs: xl,
                    rhs: xr,
                } = &x.kind
                else {
                    return Ok(if x.mentions(&lhs_c) { None } else { Some(x.clone()) });
                };
                if !xop.is_comparison() || **xl != *lhs_c {
                    return Ok(if x.mentions(&lhs_c) { None } else { Some(x.clone()) });
                }
                if xr.mentions(&lhs_c) {
                    return Ok(None);
                }
                let bform = match op {
                    AssignOp::AddEq => BinaryOp::Add,
                    AssignOp::SubEq => BinaryOp::Sub,
                    _ => return Ok(None),
                };
                let o_rhs = Expr::new(ExprKind::Binary {
                    op: bform,
                    lhs: xr.clone(),
                    rhs: rhs_c.clone(),
                });
                o_rhs.set_mtype(rewrite::ideal_type());
                let o_rhs = simplify(tm, &o_rhs)?;
                let o = Expr::new(ExprKind::Binary {
                    op: *xop,
                    lhs: xl.clone(),
                    rhs: o_rhs,
                });
                o.set_mbounds(IntRange::new(BigInt::zero(), BigInt::one()));
                o.set_mtype(rewrite::bool_type());
                Ok(Some(o))
            })?;
        }

        // When the assigned interval beats the declared type range, say so:
        // later bounds checks shouldn't have to rediscover it.
        if l_typ.is_num_type() && (op != AssignOp::Eq || rhs.const_value().is_none()) {
            let lb = self.bcheck_type_expr(&l_typ)?;
            if lb.min < nb.min {
                let c = rewrite::make_const_value_expr(self.tm, &nb.min);
                self.facts
                    .append_binary_op_fact(BinaryOp::Ge, lhs.clone(), c);
            }
            if lb.max > nb.max {
                let c = rewrite::make_const_value_expr(self.tm, &nb.max);
                self.facts
                    .append_binary_op_fact(BinaryOp::Le, lhs.clone(), c);
            }
        }

        Ok(())
    }

    pub(crate) fn bcheck_assignment1(
        &mut self,
        lhs: Option<&Rc<Expr>>,
        l_typ: Option<&Rc<TypeExpr>>,
        op: AssignOp,
        rhs: &Rc<Expr>,
    ) -> Result<IntRange, CheckError> {
        if lhs.is_none() && op != AssignOp::Eq {
            return Err(self.fail(
                ErrorKind::Internal,
                "missing LHS for compound assignment",
            ));
        }

        let lb = match l_typ {
            Some(t) => Some(self.bcheck_type_expr(t)?),
            None => None,
        };

        let rb = match op {
            AssignOp::Eq | AssignOp::EqQuestion => self.bcheck_expr(rhs, 0)?,
            _ => {
                let bform = op.binary_form().ok_or_else(|| {
                    self.fail(ErrorKind::Internal, "compound assignment has no binary form")
                })?;
                let lhs = lhs.ok_or_else(|| {
                    self.fail(ErrorKind::Internal, "missing LHS for compound assignment")
                })?;
                self.bcheck_expr_binary_op(bform, lhs, rhs, 0)?
            }
        };

        if let Some(lb) = lb {
            if rb.min < lb.min || rb.max > lb.max {
                let subject = match (op, lhs) {
                    (AssignOp::Eq, _) | (_, None) => format!("expression {:?}", rhs.str(self.tm)),
                    (_, Some(lhs)) => format!(
                        "assignment {:?}",
                        format!(
                            "{} {} {}",
                            lhs.str(self.tm),
                            op.symbol(),
                            rhs.str(self.tm)
                        )
                    ),
                };
                return Err(self.fail(
                    ErrorKind::OutOfBounds,
                    format!("{} bounds {} is not within bounds {}", subject, rb, lb),
                ));
            }
        }
        Ok(rb)
    }
}

/// Error statuses are string literals starting with `"#`.
fn is_error_status(name: &str) -> bool {
    name.len() >= 2 && name.starts_with("\"#")
}
