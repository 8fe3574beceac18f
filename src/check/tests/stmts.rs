use super::*;

use crate::ast::{Iterate, Jump, JumpKind, Ret, RetKind, While};
use std::rc::Weak;

#[test]
fn test_conditional_narrowing_accepted() {
    let mut ctx = Ctx::new();
    let x = var(&mut ctx.tm, "x", &t_u32());
    let n = arg_field(&mut ctx.tm, "n", &t_u32());
    let x2 = var(&mut ctx.tm, "x", &t_u32());
    let ten = lit(&mut ctx.tm, 10);
    let x3 = var(&mut ctx.tm, "x", &t_u32());
    let twenty = lit(&mut ctx.tm, 20);
    let fields = vec![field(&mut ctx.tm, "n", &t_u32())];
    let body = vec![
            var_decl(&mut ctx.tm, "x", &t_u32()),
            assign(Some(&x), AssignOp::Eq, &n),
            if_stmt(
                &cmp(BinaryOp::Lt, &x2, &ten),
                vec![assert_stmt(&cmp(BinaryOp::Lt, &x3, &twenty))],
                Vec::new(),
            ),
    ];
    let f = func_with(
        &mut ctx.tm,
        fields,
        None,
        Effect::Pure,
        Vec::new(),
        body,
    );
    ctx.check(&f).expect("x < 10 implies x < 20");
}

#[test]
fn test_conditional_narrowing_unprovable_outside_branch() {
    let mut ctx = Ctx::new();
    let x = var(&mut ctx.tm, "x", &t_u32());
    let n = arg_field(&mut ctx.tm, "n", &t_u32());
    let x2 = var(&mut ctx.tm, "x", &t_u32());
    let twenty = lit(&mut ctx.tm, 20);
    let fields = vec![field(&mut ctx.tm, "n", &t_u32())];
    let body = vec![
            var_decl(&mut ctx.tm, "x", &t_u32()),
            assign(Some(&x), AssignOp::Eq, &n),
            assert_stmt(&cmp(BinaryOp::Lt, &x2, &twenty)),
    ];
    let f = func_with(
        &mut ctx.tm,
        fields,
        None,
        Effect::Pure,
        Vec::new(),
        body,
    );
    let err = ctx.check(&f).expect_err("x is unconstrained");
    assert_eq!(err.kind, ErrorKind::CannotProve);
    assert!(err.message.contains("cannot prove"), "got {:?}", err.message);
}

#[test]
fn test_if_else_unifies_common_facts() {
    let mut ctx = Ctx::new();
    let b = arg_field(&mut ctx.tm, "b", &t_bool());
    let x = var(&mut ctx.tm, "x", &t_u32());
    let one = lit(&mut ctx.tm, 1);
    let x2 = var(&mut ctx.tm, "x", &t_u32());
    let one2 = lit(&mut ctx.tm, 1);
    let x3 = var(&mut ctx.tm, "x", &t_u32());
    let one3 = lit(&mut ctx.tm, 1);
    let fields = vec![field(&mut ctx.tm, "b", &t_bool())];
    let body = vec![
            var_decl(&mut ctx.tm, "x", &t_u32()),
            if_stmt(
                &b,
                vec![assign(Some(&x), AssignOp::Eq, &one)],
                vec![assign(Some(&x2), AssignOp::Eq, &one2)],
            ),
            assert_stmt(&cmp(BinaryOp::Eq, &x3, &one3)),
    ];
    let f = func_with(
        &mut ctx.tm,
        fields,
        None,
        Effect::Pure,
        Vec::new(),
        body,
    );
    ctx.check(&f).expect("both arms set x to 1");
}

#[test]
fn test_if_else_drops_divergent_facts() {
    let mut ctx = Ctx::new();
    let b = arg_field(&mut ctx.tm, "b", &t_bool());
    let x = var(&mut ctx.tm, "x", &t_u32());
    let one = lit(&mut ctx.tm, 1);
    let x2 = var(&mut ctx.tm, "x", &t_u32());
    let two = lit(&mut ctx.tm, 2);
    let x3 = var(&mut ctx.tm, "x", &t_u32());
    let one3 = lit(&mut ctx.tm, 1);
    let fields = vec![field(&mut ctx.tm, "b", &t_bool())];
    let body = vec![
            var_decl(&mut ctx.tm, "x", &t_u32()),
            if_stmt(
                &b,
                vec![assign(Some(&x), AssignOp::Eq, &one)],
                vec![assign(Some(&x2), AssignOp::Eq, &two)],
            ),
            assert_stmt(&cmp(BinaryOp::Eq, &x3, &one3)),
    ];
    let f = func_with(
        &mut ctx.tm,
        fields,
        None,
        Effect::Pure,
        Vec::new(),
        body,
    );
    let err = ctx.check(&f).expect_err("x may be 2");
    assert_eq!(err.kind, ErrorKind::CannotProve);
}

#[test]
fn test_unreachable_code_rejected() {
    let mut ctx = Ctx::new();
    let zero = lit(&mut ctx.tm, 0);
    let ret = Stmt::Ret(Ret::new(RetKind::Return, zero, 2));
    let x = var(&mut ctx.tm, "x", &t_u32());
    let one = lit(&mut ctx.tm, 1);
    let f = func_with(
        &mut ctx.tm,
        Vec::new(),
        Some(t_u32()),
        Effect::Pure,
        Vec::new(),
        vec![
            ret,
            assign(Some(&x), AssignOp::Eq, &one),
        ],
    );
    let err = ctx.check(&f).expect_err("code after ret");
    assert_eq!(err.kind, ErrorKind::Structural);
    assert!(err.message.contains("unreachable"), "got {:?}", err.message);
}

#[test]
fn test_var_has_implicit_zero() {
    let mut ctx = Ctx::new();
    let x = var(&mut ctx.tm, "x", &t_u32());
    let zero = lit(&mut ctx.tm, 0);
    let body = vec![
            var_decl(&mut ctx.tm, "x", &t_u32()),
            assert_stmt(&cmp(BinaryOp::Eq, &x, &zero)),
    ];
    let f = func(
        &mut ctx.tm,
        body,
    );
    ctx.check(&f).expect("var x starts at 0");
}

#[test]
fn test_while_loop_discipline() {
    let mut ctx = Ctx::new();
    let i = var(&mut ctx.tm, "i", &t_u32());
    let four = lit(&mut ctx.tm, 4);
    let cond = cmp(BinaryOp::Lt, &i, &four);

    let i_inv = var(&mut ctx.tm, "i", &t_u32());
    let four_inv = lit(&mut ctx.tm, 4);
    let inv = assert_kw(AssertKind::Inv, &cmp(BinaryOp::Le, &i_inv, &four_inv));

    let i_post = var(&mut ctx.tm, "i", &t_u32());
    let four_post = lit(&mut ctx.tm, 4);
    let post = assert_kw(AssertKind::Post, &cmp(BinaryOp::Ge, &i_post, &four_post));

    let i_body = var(&mut ctx.tm, "i", &t_u32());
    let one = lit(&mut ctx.tm, 1);
    let body = vec![assign(Some(&i_body), AssignOp::AddEq, &one)];

    let w = Rc::new(While {
        condition: cond,
        asserts: vec![inv, post],
        body,
        line: 2,
    });

    let i_after = var(&mut ctx.tm, "i", &t_u32());
    let four_after = lit(&mut ctx.tm, 4);
    let body = vec![
            var_decl(&mut ctx.tm, "i", &t_u32()),
            Stmt::While(w),
            assert_stmt(&cmp(BinaryOp::Ge, &i_after, &four_after)),
    ];
    let f = func(
        &mut ctx.tm,
        body,
    );
    ctx.check(&f).expect("inductive counter loop");
}

#[test]
fn test_while_body_violating_invariant_rejected() {
    let mut ctx = Ctx::new();
    let i = var(&mut ctx.tm, "i", &t_u32());
    let four = lit(&mut ctx.tm, 4);
    let cond = cmp(BinaryOp::Lt, &i, &four);

    let i_inv = var(&mut ctx.tm, "i", &t_u32());
    let four_inv = lit(&mut ctx.tm, 4);
    let inv = assert_kw(AssertKind::Inv, &cmp(BinaryOp::Le, &i_inv, &four_inv));

    let i_body = var(&mut ctx.tm, "i", &t_u32());
    let two = lit(&mut ctx.tm, 2);
    let body = vec![assign(Some(&i_body), AssignOp::AddEq, &two)];

    let w = Rc::new(While {
        condition: cond,
        asserts: vec![inv],
        body,
        line: 2,
    });
    let body = vec![var_decl(&mut ctx.tm, "i", &t_u32()), Stmt::While(w)];
    let f = func(&mut ctx.tm, body);
    // i can reach 5 at the implicit continue.
    let err = ctx.check(&f).expect_err("i <= 4 is not maintained");
    assert_eq!(err.kind, ErrorKind::CannotProve);
}

#[test]
fn test_while_true_break_discharges_post() {
    let mut ctx = Ctx::new();
    let cond = bool_lit(&mut ctx.tm, true);

    let x_post = var(&mut ctx.tm, "x", &t_u32());
    let one_post = lit(&mut ctx.tm, 1);
    let post = assert_kw(AssertKind::Post, &cmp(BinaryOp::Ge, &x_post, &one_post));

    let x_body = var(&mut ctx.tm, "x", &t_u32());
    let one_body = lit(&mut ctx.tm, 1);

    let w = Rc::new_cyclic(|weak: &Weak<While>| {
        let brk = Stmt::Jump(Rc::new(Jump {
            keyword: JumpKind::Break,
            target: weak.clone(),
            line: 4,
        }));
        While {
            condition: cond,
            asserts: vec![post],
            body: vec![assign(Some(&x_body), AssignOp::Eq, &one_body), brk],
            line: 2,
        }
    });

    let x_after = var(&mut ctx.tm, "x", &t_u32());
    let one_after = lit(&mut ctx.tm, 1);
    let body = vec![
            var_decl(&mut ctx.tm, "x", &t_u32()),
            Stmt::While(w),
            assert_stmt(&cmp(BinaryOp::Ge, &x_after, &one_after)),
    ];
    let f = func(
        &mut ctx.tm,
        body,
    );
    ctx.check(&f).expect("break establishes the post condition");
}

#[test]
fn test_continue_discharges_pre_and_inv() {
    let mut ctx = Ctx::new();
    let i = var(&mut ctx.tm, "i", &t_u32());
    let three = lit(&mut ctx.tm, 3);
    let cond = cmp(BinaryOp::Lt, &i, &three);

    let i_inv = var(&mut ctx.tm, "i", &t_u32());
    let three_inv = lit(&mut ctx.tm, 3);
    let inv = assert_kw(AssertKind::Inv, &cmp(BinaryOp::Le, &i_inv, &three_inv));

    let w = Rc::new_cyclic(|weak: &Weak<While>| {
        let cont = Stmt::Jump(Rc::new(Jump {
            keyword: JumpKind::Continue,
            target: weak.clone(),
            line: 3,
        }));
        While {
            condition: cond,
            asserts: vec![inv],
            body: vec![cont],
            line: 2,
        }
    });
    let body = vec![var_decl(&mut ctx.tm, "i", &t_u32()), Stmt::While(w)];
    let f = func(&mut ctx.tm, body);
    ctx.check(&f).expect("inv holds at the continue");
}

#[test]
fn test_slice_assignment_mints_length_fact() {
    let mut ctx = Ctx::new();
    let src = arg_field(&mut ctx.tm, "src", &t_slice_u8());
    let len16 = lit(&mut ctx.tm, 16);
    let in_fact = assert_kw(
        AssertKind::Pre,
        &cmp(BinaryOp::Eq, &length_call(&mut ctx.tm, &src), &len16),
    );

    let s = var(&mut ctx.tm, "s", &t_slice_u8());
    let src2 = arg_field(&mut ctx.tm, "src", &t_slice_u8());
    let two = lit(&mut ctx.tm, 2);
    let ten = lit(&mut ctx.tm, 10);
    let sliced = slice_of(&src2, Some(two), Some(ten));

    let s2 = var(&mut ctx.tm, "s", &t_slice_u8());
    let eight = lit(&mut ctx.tm, 8);
    let s2_len = length_call(&mut ctx.tm, &s2);

    let fields = vec![field(&mut ctx.tm, "src", &t_slice_u8())];
    let body = vec![
            var_decl(&mut ctx.tm, "s", &t_slice_u8()),
            assign(Some(&s), AssignOp::Eq, &sliced),
            assert_stmt(&cmp(BinaryOp::Eq, &s2_len, &eight)),
    ];
    let f = func_with(
        &mut ctx.tm,
        fields,
        None,
        Effect::Pure,
        vec![in_fact],
        body,
    );
    ctx.check(&f).expect("s = src[2 .. 10] fixes s.length() to 8");
}

#[test]
fn test_slice_upper_bound_unprovable_rejected() {
    let mut ctx = Ctx::new();
    let src = arg_field(&mut ctx.tm, "src", &t_slice_u8());
    let two = lit(&mut ctx.tm, 2);
    let ten = lit(&mut ctx.tm, 10);
    let sliced = slice_of(&src, Some(two), Some(ten));
    let s = var(&mut ctx.tm, "s", &t_slice_u8());
    let fields = vec![field(&mut ctx.tm, "src", &t_slice_u8())];
    let body = vec![
            var_decl(&mut ctx.tm, "s", &t_slice_u8()),
            assign(Some(&s), AssignOp::Eq, &sliced),
    ];
    let f = func_with(
        &mut ctx.tm,
        fields,
        None,
        Effect::Pure,
        Vec::new(),
        body,
    );
    let err = ctx.check(&f).expect_err("src.length() is unknown");
    assert_eq!(err.kind, ErrorKind::CannotProve);
}

#[test]
fn test_index_in_bounds_after_guard() {
    let mut ctx = Ctx::new();
    let src = arg_field(&mut ctx.tm, "src", &t_slice_u8());
    let len16 = lit(&mut ctx.tm, 16);
    let in_fact = assert_kw(
        AssertKind::Pre,
        &cmp(BinaryOp::Eq, &length_call(&mut ctx.tm, &src), &len16),
    );

    let i = arg_field(&mut ctx.tm, "i", &t_u32());
    let eight = lit(&mut ctx.tm, 8);
    let guard = cmp(BinaryOp::Lt, &i, &eight);

    let src2 = arg_field(&mut ctx.tm, "src", &t_slice_u8());
    let i2 = arg_field(&mut ctx.tm, "i", &t_u32());
    let elem = index(&src2, &i2, &t_u8());
    let y = var(&mut ctx.tm, "y", &t_u8());

    let fields = vec![
        field(&mut ctx.tm, "src", &t_slice_u8()),
        field(&mut ctx.tm, "i", &t_u32()),
    ];
    let body = vec![
            var_decl(&mut ctx.tm, "y", &t_u8()),
            if_stmt(&guard, vec![assign(Some(&y), AssignOp::Eq, &elem)], Vec::new()),
    ];
    let f = func_with(
        &mut ctx.tm,
        fields,
        None,
        Effect::Pure,
        vec![in_fact],
        body,
    );
    ctx.check(&f).expect("i < 8 <= src.length()");
    assert_eq!(elem.mbounds(), Some(range(0, 255)));
}

#[test]
fn test_index_without_guard_rejected() {
    let mut ctx = Ctx::new();
    let src = arg_field(&mut ctx.tm, "src", &t_slice_u8());
    let len16 = lit(&mut ctx.tm, 16);
    let in_fact = assert_kw(
        AssertKind::Pre,
        &cmp(BinaryOp::Eq, &length_call(&mut ctx.tm, &src), &len16),
    );
    let src2 = arg_field(&mut ctx.tm, "src", &t_slice_u8());
    let i = arg_field(&mut ctx.tm, "i", &t_u32());
    let elem = index(&src2, &i, &t_u8());
    let y = var(&mut ctx.tm, "y", &t_u8());
    let fields = vec![
        field(&mut ctx.tm, "src", &t_slice_u8()),
        field(&mut ctx.tm, "i", &t_u32()),
    ];
    let body = vec![
            var_decl(&mut ctx.tm, "y", &t_u8()),
            assign(Some(&y), AssignOp::Eq, &elem),
    ];
    let f = func_with(
        &mut ctx.tm,
        fields,
        None,
        Effect::Pure,
        vec![in_fact],
        body,
    );
    let err = ctx.check(&f).expect_err("i may reach past the slice");
    assert_eq!(err.kind, ErrorKind::CannotProve);
}

#[test]
fn test_plus_eq_rewrites_facts() {
    let mut ctx = Ctx::new();
    let x = var(&mut ctx.tm, "x", &t_u32());
    let five = lit(&mut ctx.tm, 5);
    let x2 = var(&mut ctx.tm, "x", &t_u32());
    let two = lit(&mut ctx.tm, 2);
    let x3 = var(&mut ctx.tm, "x", &t_u32());
    let seven = lit(&mut ctx.tm, 7);
    let body = vec![
            var_decl(&mut ctx.tm, "x", &t_u32()),
            assign(Some(&x), AssignOp::Eq, &five),
            assign(Some(&x2), AssignOp::AddEq, &two),
            assert_stmt(&cmp(BinaryOp::Eq, &x3, &seven)),
    ];
    let f = func(
        &mut ctx.tm,
        body,
    );
    ctx.check(&f).expect("x == 5 becomes x == 7 across x += 2");
}

#[test]
fn test_impure_call_keeps_unrelated_facts() {
    let mut ctx = Ctx::new();
    let x = var(&mut ctx.tm, "x", &t_u32());
    let five = lit(&mut ctx.tm, 5);
    let this = this_record(&mut ctx.tm);
    let call = method_call(
        &mut ctx.tm,
        &this,
        "munge",
        Vec::new(),
        &t_u32(),
        Effect::Impure,
    );
    let y = var(&mut ctx.tm, "y", &t_u32());
    let x2 = var(&mut ctx.tm, "x", &t_u32());
    let five2 = lit(&mut ctx.tm, 5);
    let body = vec![
            var_decl(&mut ctx.tm, "x", &t_u32()),
            var_decl(&mut ctx.tm, "y", &t_u32()),
            assign(Some(&x), AssignOp::Eq, &five),
            assign(Some(&y), AssignOp::Eq, &call),
            assert_stmt(&cmp(BinaryOp::Eq, &x2, &five2)),
    ];
    let f = func(
        &mut ctx.tm,
        body,
    );
    ctx.check(&f).expect("x is not reachable through the call");
}

#[test]
fn test_impure_call_invalidates_ref_argument_facts() {
    let mut ctx = Ctx::new();
    let src = arg_field(&mut ctx.tm, "src", &t_slice_u8());
    let len16 = lit(&mut ctx.tm, 16);
    let in_fact = assert_kw(
        AssertKind::Pre,
        &cmp(BinaryOp::Eq, &length_call(&mut ctx.tm, &src), &len16),
    );

    let s = var(&mut ctx.tm, "s", &t_slice_u8());
    let src2 = arg_field(&mut ctx.tm, "src", &t_slice_u8());
    let zero = lit(&mut ctx.tm, 0);
    let eight = lit(&mut ctx.tm, 8);
    let sliced = slice_of(&src2, Some(zero), Some(eight));

    let this = this_record(&mut ctx.tm);
    let s_arg = var(&mut ctx.tm, "s", &t_slice_u8());
    let call = method_call(
        &mut ctx.tm,
        &this,
        "munge",
        vec![s_arg],
        &t_u32(),
        Effect::Impure,
    );
    let y = var(&mut ctx.tm, "y", &t_u32());

    let s3 = var(&mut ctx.tm, "s", &t_slice_u8());
    let eight2 = lit(&mut ctx.tm, 8);
    let s3_len = length_call(&mut ctx.tm, &s3);

    let fields = vec![field(&mut ctx.tm, "src", &t_slice_u8())];
    let body = vec![
            var_decl(&mut ctx.tm, "s", &t_slice_u8()),
            var_decl(&mut ctx.tm, "y", &t_u32()),
            assign(Some(&s), AssignOp::Eq, &sliced),
            assign(Some(&y), AssignOp::Eq, &call),
            assert_stmt(&cmp(BinaryOp::Eq, &s3_len, &eight2)),
    ];
    let f = func_with(
        &mut ctx.tm,
        fields,
        None,
        Effect::Pure,
        vec![in_fact],
        body,
    );
    let err = ctx
        .check(&f)
        .expect_err("passing s by reference invalidates s.length()");
    assert_eq!(err.kind, ErrorKind::CannotProve);
}

#[test]
fn test_coroutine_call_drops_args_facts() {
    let mut ctx = Ctx::new();
    let n = arg_field(&mut ctx.tm, "n", &t_u32());
    let three = lit(&mut ctx.tm, 3);
    let in_fact = assert_kw(AssertKind::Pre, &cmp(BinaryOp::Eq, &n, &three));

    let n2 = arg_field(&mut ctx.tm, "n", &t_u32());
    let three2 = lit(&mut ctx.tm, 3);
    let first = assert_stmt(&cmp(BinaryOp::Eq, &n2, &three2));

    let this = this_record(&mut ctx.tm);
    let call = method_call(
        &mut ctx.tm,
        &this,
        "sub",
        Vec::new(),
        &t_status(),
        Effect::Coroutine,
    );
    let y = var(&mut ctx.tm, "y", &t_status());

    let n3 = arg_field(&mut ctx.tm, "n", &t_u32());
    let three3 = lit(&mut ctx.tm, 3);
    let second = assert_stmt(&cmp(BinaryOp::Eq, &n3, &three3));

    let fields = vec![field(&mut ctx.tm, "n", &t_u32())];
    let body = vec![
            var_decl(&mut ctx.tm, "y", &t_status()),
            first,
            assign(Some(&y), AssignOp::Eq, &call),
            second,
    ];
    let f = func_with(
        &mut ctx.tm,
        fields,
        None,
        Effect::Coroutine,
        vec![in_fact],
        body,
    );
    let err = ctx
        .check(&f)
        .expect_err("the suspension dropped the args fact");
    assert_eq!(err.kind, ErrorKind::CannotProve);
}

#[test]
fn test_interrogating_call_keeps_args_facts() {
    let mut ctx = Ctx::new();
    let n = arg_field(&mut ctx.tm, "n", &t_u32());
    let three = lit(&mut ctx.tm, 3);
    let in_fact = assert_kw(AssertKind::Pre, &cmp(BinaryOp::Eq, &n, &three));

    let this = this_record(&mut ctx.tm);
    let call = method_call(
        &mut ctx.tm,
        &this,
        "sub",
        Vec::new(),
        &t_status(),
        Effect::Coroutine,
    );
    let y = var(&mut ctx.tm, "y", &t_status());

    let n2 = arg_field(&mut ctx.tm, "n", &t_u32());
    let three2 = lit(&mut ctx.tm, 3);
    let second = assert_stmt(&cmp(BinaryOp::Eq, &n2, &three2));

    let fields = vec![field(&mut ctx.tm, "n", &t_u32())];
    let body = vec![
            var_decl(&mut ctx.tm, "y", &t_status()),
            assign(Some(&y), AssignOp::EqQuestion, &call),
            second,
    ];
    let f = func_with(
        &mut ctx.tm,
        fields,
        None,
        Effect::Coroutine,
        vec![in_fact],
        body,
    );
    ctx.check(&f)
        .expect("an interrogating call is not a suspension point");
}

#[test]
fn test_ret_error_status_is_marked() {
    let mut ctx = Ctx::new();
    let bad = var(&mut ctx.tm, "\"#too much data\"", &t_status());
    let ret = Ret::new(RetKind::Return, bad, 2);
    let f = func_with(
        &mut ctx.tm,
        Vec::new(),
        Some(t_status()),
        Effect::Pure,
        Vec::new(),
        vec![Stmt::Ret(ret.clone())],
    );
    ctx.check(&f).expect("returning a status is fine");
    assert!(ret.rets_error());
}

#[test]
fn test_ret_ok_status_is_not_marked() {
    let mut ctx = Ctx::new();
    let ok = var(&mut ctx.tm, "ok", &t_status());
    let ret = Ret::new(RetKind::Return, ok, 2);
    let f = func_with(
        &mut ctx.tm,
        Vec::new(),
        Some(t_status()),
        Effect::Pure,
        Vec::new(),
        vec![Stmt::Ret(ret.clone())],
    );
    ctx.check(&f).expect("ok is not an error");
    assert!(!ret.rets_error());
}

#[test]
fn test_ret_value_out_of_bounds_rejected() {
    let mut ctx = Ctx::new();
    let big = lit(&mut ctx.tm, 300);
    let ret = Ret::new(RetKind::Return, big, 2);
    let f = func_with(
        &mut ctx.tm,
        Vec::new(),
        Some(t_u8()),
        Effect::Pure,
        Vec::new(),
        vec![Stmt::Ret(ret)],
    );
    let err = ctx.check(&f).expect_err("300 does not fit u8");
    assert_eq!(err.kind, ErrorKind::OutOfBounds);
}

#[test]
fn test_iterate_seeds_length_facts_and_clears_after() {
    let mut ctx = Ctx::new();
    let src = arg_field(&mut ctx.tm, "src", &t_slice_u8());
    let len16 = lit(&mut ctx.tm, 16);
    let in_fact = assert_kw(
        AssertKind::Pre,
        &cmp(BinaryOp::Eq, &length_call(&mut ctx.tm, &src), &len16),
    );

    let v = var(&mut ctx.tm, "v", &t_slice_u8());
    let src2 = arg_field(&mut ctx.tm, "src", &t_slice_u8());
    let zero = lit(&mut ctx.tm, 0);
    let eight = lit(&mut ctx.tm, 8);
    let sliced = slice_of(&src2, Some(zero), Some(eight));
    let iter_assign = Rc::new(crate::ast::Assign {
        lhs: Some(v),
        op: AssignOp::Eq,
        rhs: sliced,
        line: 2,
    });

    let v2 = var(&mut ctx.tm, "v", &t_slice_u8());
    let eight2 = lit(&mut ctx.tm, 8);
    let v2_len = length_call(&mut ctx.tm, &v2);
    let unroll = lit(&mut ctx.tm, 1);

    let it = Rc::new(Iterate {
        assigns: vec![iter_assign],
        length: 8,
        unroll,
        body: vec![assert_stmt(&cmp(BinaryOp::Eq, &v2_len, &eight2))],
        else_iterate: None,
        line: 2,
    });

    let fields = vec![field(&mut ctx.tm, "src", &t_slice_u8())];
    let f = func_with(
        &mut ctx.tm,
        fields,
        None,
        Effect::Pure,
        vec![in_fact],
        vec![Stmt::Iterate(it)],
    );
    ctx.check(&f).expect("the body sees v.length() == 8");
}
