//! Typed abstract syntax for Rill.
//!
//! The checker consumes a fully parsed, type-annotated tree: every expression
//! node arrives with its resolved type (`mtype`) and, for literals, a constant
//! value. The checker writes one further annotation back — the inferred
//! `[min, max]` interval (`mbounds`) — so annotations live in interior-mutable
//! cells rather than requiring tree rebuilds. Nodes are `Rc`-shared: the fact
//! store aliases subtrees freely and never mutates their structure.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use num_bigint::BigInt;
use num_traits::One;

use crate::interval::IntRange;
use crate::token::{IdMap, Ident};

/// Lower bound of the `ideal` type: `-(1 << 1000)`.
pub fn min_ideal() -> BigInt {
    -(BigInt::one() << 1000u32)
}

/// Upper bound of the `ideal` type: `1 << 1000`.
pub fn max_ideal() -> BigInt {
    BigInt::one() << 1000u32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Effect {
    #[default]
    Pure,
    Impure,
    Coroutine,
}

impl Effect {
    pub fn is_pure(self) -> bool {
        self == Effect::Pure
    }

    pub fn is_impure(self) -> bool {
        !self.is_pure()
    }

    pub fn is_coroutine(self) -> bool {
        self == Effect::Coroutine
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Pos,
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Shl,
    Shr,
    ModShl,
    BitAnd,
    BitOr,
    BitXor,
    ModAdd,
    ModSub,
    ModMul,
    SatAdd,
    SatSub,
    Eq,
    Ne,
    Lt,
    Le,
    Ge,
    Gt,
    And,
    Or,
}

impl BinaryOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Ge | BinaryOp::Gt
        )
    }

    /// Logical negation of a comparison: `<` becomes `>=`, etc.
    pub fn invert_comparison(self) -> Option<BinaryOp> {
        Some(match self {
            BinaryOp::Eq => BinaryOp::Ne,
            BinaryOp::Ne => BinaryOp::Eq,
            BinaryOp::Lt => BinaryOp::Ge,
            BinaryOp::Le => BinaryOp::Gt,
            BinaryOp::Ge => BinaryOp::Lt,
            BinaryOp::Gt => BinaryOp::Le,
            _ => return None,
        })
    }

    /// The comparison with its operands flipped: `a < b` iff `b > a`.
    pub fn swap_comparison(self) -> Option<BinaryOp> {
        Some(match self {
            BinaryOp::Eq => BinaryOp::Eq,
            BinaryOp::Ne => BinaryOp::Ne,
            BinaryOp::Lt => BinaryOp::Gt,
            BinaryOp::Le => BinaryOp::Ge,
            BinaryOp::Ge => BinaryOp::Le,
            BinaryOp::Gt => BinaryOp::Lt,
            _ => return None,
        })
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::ModShl => "~mod<<",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::ModAdd => "~mod+",
            BinaryOp::ModSub => "~mod-",
            BinaryOp::ModMul => "~mod*",
            BinaryOp::SatAdd => "~sat+",
            BinaryOp::SatSub => "~sat-",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Ge => ">=",
            BinaryOp::Gt => ">",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssocOp {
    And,
    Or,
}

impl AssocOp {
    pub fn binary_form(self) -> BinaryOp {
        match self {
            AssocOp::And => BinaryOp::And,
            AssocOp::Or => BinaryOp::Or,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Eq,
    EqQuestion,
    AddEq,
    SubEq,
    MulEq,
    DivEq,
    ShlEq,
    ShrEq,
    ModShlEq,
    AndEq,
    OrEq,
    XorEq,
    ModAddEq,
    ModSubEq,
    ModMulEq,
    SatAddEq,
    SatSubEq,
}

impl AssignOp {
    /// The binary operator a compound assignment abbreviates; `None` for the
    /// plain and interrogating forms.
    pub fn binary_form(self) -> Option<BinaryOp> {
        Some(match self {
            AssignOp::Eq | AssignOp::EqQuestion => return None,
            AssignOp::AddEq => BinaryOp::Add,
            AssignOp::SubEq => BinaryOp::Sub,
            AssignOp::MulEq => BinaryOp::Mul,
            AssignOp::DivEq => BinaryOp::Div,
            AssignOp::ShlEq => BinaryOp::Shl,
            AssignOp::ShrEq => BinaryOp::Shr,
            AssignOp::ModShlEq => BinaryOp::ModShl,
            AssignOp::AndEq => BinaryOp::BitAnd,
            AssignOp::OrEq => BinaryOp::BitOr,
            AssignOp::XorEq => BinaryOp::BitXor,
            AssignOp::ModAddEq => BinaryOp::ModAdd,
            AssignOp::ModSubEq => BinaryOp::ModSub,
            AssignOp::ModMulEq => BinaryOp::ModMul,
            AssignOp::SatAddEq => BinaryOp::SatAdd,
            AssignOp::SatSubEq => BinaryOp::SatSub,
        })
    }

    pub fn symbol(self) -> &'static str {
        match self {
            AssignOp::Eq => "=",
            AssignOp::EqQuestion => "=?",
            AssignOp::AddEq => "+=",
            AssignOp::SubEq => "-=",
            AssignOp::MulEq => "*=",
            AssignOp::DivEq => "/=",
            AssignOp::ShlEq => "<<=",
            AssignOp::ShrEq => ">>=",
            AssignOp::ModShlEq => "~mod<<=",
            AssignOp::AndEq => "&=",
            AssignOp::OrEq => "|=",
            AssignOp::XorEq => "^=",
            AssignOp::ModAddEq => "~mod+=",
            AssignOp::ModSubEq => "~mod-=",
            AssignOp::ModMulEq => "~mod*=",
            AssignOp::SatAddEq => "~sat+=",
            AssignOp::SatSubEq => "~sat-=",
        }
    }
}

#[derive(Debug, PartialEq)]
pub enum ExprKind {
    Ident(Ident),
    Unary {
        op: UnaryOp,
        operand: Rc<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Rc<Expr>,
        rhs: Rc<Expr>,
    },
    As {
        operand: Rc<Expr>,
        target: Rc<TypeExpr>,
    },
    Assoc {
        op: AssocOp,
        args: Vec<Rc<Expr>>,
    },
    Call {
        callee: Rc<Expr>,
        args: Vec<Rc<Expr>>,
    },
    Index {
        lhs: Rc<Expr>,
        index: Rc<Expr>,
    },
    Slice {
        lhs: Rc<Expr>,
        from: Option<Rc<Expr>>,
        to: Option<Rc<Expr>>,
    },
    Selector {
        lhs: Rc<Expr>,
        field: Ident,
    },
    List {
        args: Vec<Rc<Expr>>,
    },
}

#[derive(Debug)]
pub struct Expr {
    pub kind: ExprKind,
    pub effect: Effect,
    const_value: RefCell<Option<BigInt>>,
    mtype: RefCell<Option<Rc<TypeExpr>>>,
    mbounds: RefCell<Option<IntRange>>,
}

/// Fact identity is syntactic: two expressions are equal iff their kinds match
/// structurally. Checker annotations do not participate.
impl PartialEq for Expr {
    fn eq(&self, other: &Expr) -> bool {
        self.kind == other.kind
    }
}

impl Eq for Expr {}

impl Expr {
    pub fn new(kind: ExprKind) -> Rc<Expr> {
        Expr::with_effect(kind, Effect::Pure)
    }

    pub fn with_effect(kind: ExprKind, effect: Effect) -> Rc<Expr> {
        Rc::new(Expr {
            kind,
            effect,
            const_value: RefCell::new(None),
            mtype: RefCell::new(None),
            mbounds: RefCell::new(None),
        })
    }

    pub fn ident(id: Ident) -> Rc<Expr> {
        Expr::new(ExprKind::Ident(id))
    }

    pub fn as_ident(&self) -> Option<Ident> {
        match self.kind {
            ExprKind::Ident(id) => Some(id),
            _ => None,
        }
    }

    pub fn const_value(&self) -> Option<BigInt> {
        self.const_value.borrow().clone()
    }

    pub fn set_const_value(&self, v: BigInt) {
        *self.const_value.borrow_mut() = Some(v);
    }

    pub fn mtype(&self) -> Option<Rc<TypeExpr>> {
        self.mtype.borrow().clone()
    }

    pub fn set_mtype(&self, t: Rc<TypeExpr>) {
        *self.mtype.borrow_mut() = Some(t);
    }

    pub fn mbounds(&self) -> Option<IntRange> {
        self.mbounds.borrow().clone()
    }

    pub fn set_mbounds(&self, b: IntRange) {
        *self.mbounds.borrow_mut() = Some(b);
    }

    pub fn is_bool(&self) -> bool {
        self.mtype().is_some_and(|t| t.is_bool())
    }

    /// Clears cached intervals on this subtree so a later walk re-derives them
    /// under the facts then in force. Types and constant values stay.
    pub fn drop_cached_mbounds(&self) {
        *self.mbounds.borrow_mut() = None;
        self.visit_children(&mut |child| child.drop_cached_mbounds());
    }

    /// Direct child expressions, in source order. The target of an `as` is a
    /// type, not a child.
    pub fn children(&self) -> Vec<&Rc<Expr>> {
        let mut out = Vec::new();
        self.visit_children(&mut |child| out.push(child));
        out
    }

    fn visit_children<'s>(&'s self, f: &mut dyn FnMut(&'s Rc<Expr>)) {
        match &self.kind {
            ExprKind::Ident(_) => {}
            ExprKind::Unary { operand, .. } => f(operand),
            ExprKind::Binary { lhs, rhs, .. } => {
                f(lhs);
                f(rhs);
            }
            ExprKind::As { operand, .. } => f(operand),
            ExprKind::Assoc { args, .. } | ExprKind::List { args } => {
                for a in args {
                    f(a);
                }
            }
            ExprKind::Call { callee, args } => {
                f(callee);
                for a in args {
                    f(a);
                }
            }
            ExprKind::Index { lhs, index } => {
                f(lhs);
                f(index);
            }
            ExprKind::Slice { lhs, from, to } => {
                f(lhs);
                if let Some(from) = from {
                    f(from);
                }
                if let Some(to) = to {
                    f(to);
                }
            }
            ExprKind::Selector { lhs, .. } => f(lhs),
        }
    }

    /// Whether `x` occurs anywhere in this subtree (including at the root),
    /// compared syntactically.
    pub fn mentions(&self, x: &Expr) -> bool {
        if self == x {
            return true;
        }
        let mut found = false;
        self.visit_children(&mut |child| {
            if !found && child.mentions(x) {
                found = true;
            }
        });
        found
    }

    /// Splits a method call `recv.method(args)` into its parts.
    pub fn is_method_call(&self) -> Option<(&Rc<Expr>, Ident, &[Rc<Expr>])> {
        if let ExprKind::Call { callee, args } = &self.kind {
            if let ExprKind::Selector { lhs, field } = &callee.kind {
                return Some((lhs, *field, args));
            }
        }
        None
    }

    /// Splits a slice expression `x[from .. to]` into its parts.
    pub fn is_slice(&self) -> Option<(&Rc<Expr>, Option<&Rc<Expr>>, Option<&Rc<Expr>>)> {
        if let ExprKind::Slice { lhs, from, to } = &self.kind {
            return Some((lhs, from.as_ref(), to.as_ref()));
        }
        None
    }

    /// Canonical source form, used for diagnostics and for keying facts during
    /// branch unification.
    pub fn str(&self, tm: &IdMap) -> String {
        self.str_depth(tm, 0)
    }

    fn str_depth(&self, tm: &IdMap, depth: u32) -> String {
        let parens = |s: String| {
            if depth > 0 {
                format!("({})", s)
            } else {
                s
            }
        };
        match &self.kind {
            ExprKind::Ident(id) => tm.name(*id).to_string(),
            ExprKind::Unary { op, operand } => {
                let sym = match op {
                    UnaryOp::Pos => "+",
                    UnaryOp::Neg => "-",
                    UnaryOp::Not => "not ",
                };
                parens(format!("{}{}", sym, operand.str_depth(tm, depth + 1)))
            }
            ExprKind::Binary { op, lhs, rhs } => parens(format!(
                "{} {} {}",
                lhs.str_depth(tm, depth + 1),
                op.symbol(),
                rhs.str_depth(tm, depth + 1)
            )),
            ExprKind::As { operand, target } => parens(format!(
                "{} as {}",
                operand.str_depth(tm, depth + 1),
                target.str(tm)
            )),
            ExprKind::Assoc { op, args } => {
                let sym = op.binary_form().symbol();
                let joined = args
                    .iter()
                    .map(|a| a.str_depth(tm, depth + 1))
                    .collect::<Vec<_>>()
                    .join(&format!(" {} ", sym));
                parens(joined)
            }
            ExprKind::Call { callee, args } => {
                let joined = args
                    .iter()
                    .map(|a| a.str_depth(tm, 0))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{}({})", callee.str_depth(tm, depth + 1), joined)
            }
            ExprKind::Index { lhs, index } => format!(
                "{}[{}]",
                lhs.str_depth(tm, depth + 1),
                index.str_depth(tm, 0)
            ),
            ExprKind::Slice { lhs, from, to } => {
                let from = from.as_ref().map(|e| e.str_depth(tm, 0)).unwrap_or_default();
                let to = to.as_ref().map(|e| e.str_depth(tm, 0)).unwrap_or_default();
                format!("{}[{} .. {}]", lhs.str_depth(tm, depth + 1), from, to)
            }
            ExprKind::Selector { lhs, field } => {
                format!("{}.{}", lhs.str_depth(tm, depth + 1), tm.name(*field))
            }
            ExprKind::List { args } => args
                .iter()
                .map(|a| a.str_depth(tm, 0))
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prim {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    Bool,
    Ideal,
    IoToken,
    CpuArch,
    Status,
    Nullptr,
    EmptyStruct,
}

impl Prim {
    pub fn is_integer(self) -> bool {
        self.bit_width().is_some()
    }

    pub fn is_unsigned(self) -> bool {
        matches!(self, Prim::U8 | Prim::U16 | Prim::U32 | Prim::U64)
    }

    pub fn bit_width(self) -> Option<u64> {
        Some(match self {
            Prim::I8 | Prim::U8 => 8,
            Prim::I16 | Prim::U16 => 16,
            Prim::I32 | Prim::U32 => 32,
            Prim::I64 | Prim::U64 => 64,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Prim::I8 => "i8",
            Prim::I16 => "i16",
            Prim::I32 => "i32",
            Prim::I64 => "i64",
            Prim::U8 => "u8",
            Prim::U16 => "u16",
            Prim::U32 => "u32",
            Prim::U64 => "u64",
            Prim::Bool => "bool",
            Prim::Ideal => "ideal",
            Prim::IoToken => "io",
            Prim::CpuArch => "cpu_arch",
            Prim::Status => "status",
            Prim::Nullptr => "nullptr",
            Prim::EmptyStruct => "empty_struct",
        }
    }
}

#[derive(Debug, PartialEq)]
pub enum TypeKind {
    /// A primitive, optionally refined by constant `min`/`max` expressions.
    Prim {
        prim: Prim,
        min: Option<Rc<Expr>>,
        max: Option<Rc<Expr>>,
    },
    Array {
        inner: Rc<TypeExpr>,
        length: Rc<Expr>,
    },
    Slice {
        inner: Rc<TypeExpr>,
    },
    Table {
        inner: Rc<TypeExpr>,
    },
    Ptr {
        inner: Rc<TypeExpr>,
    },
    Nptr {
        inner: Rc<TypeExpr>,
    },
    Func {
        receiver: Rc<TypeExpr>,
        name: Ident,
    },
}

#[derive(Debug)]
pub struct TypeExpr {
    pub kind: TypeKind,
    mbounds: RefCell<Option<IntRange>>,
}

impl PartialEq for TypeExpr {
    fn eq(&self, other: &TypeExpr) -> bool {
        self.kind == other.kind
    }
}

impl Eq for TypeExpr {}

impl TypeExpr {
    pub fn new(kind: TypeKind) -> Rc<TypeExpr> {
        Rc::new(TypeExpr {
            kind,
            mbounds: RefCell::new(None),
        })
    }

    pub fn prim(p: Prim) -> Rc<TypeExpr> {
        TypeExpr::new(TypeKind::Prim {
            prim: p,
            min: None,
            max: None,
        })
    }

    pub fn refined(p: Prim, min: Option<Rc<Expr>>, max: Option<Rc<Expr>>) -> Rc<TypeExpr> {
        TypeExpr::new(TypeKind::Prim { prim: p, min, max })
    }

    pub fn array(inner: Rc<TypeExpr>, length: Rc<Expr>) -> Rc<TypeExpr> {
        TypeExpr::new(TypeKind::Array { inner, length })
    }

    pub fn slice(inner: Rc<TypeExpr>) -> Rc<TypeExpr> {
        TypeExpr::new(TypeKind::Slice { inner })
    }

    pub fn ptr(inner: Rc<TypeExpr>) -> Rc<TypeExpr> {
        TypeExpr::new(TypeKind::Ptr { inner })
    }

    pub fn nptr(inner: Rc<TypeExpr>) -> Rc<TypeExpr> {
        TypeExpr::new(TypeKind::Nptr { inner })
    }

    pub fn func(receiver: Rc<TypeExpr>, name: Ident) -> Rc<TypeExpr> {
        TypeExpr::new(TypeKind::Func { receiver, name })
    }

    pub fn prim_kind(&self) -> Option<Prim> {
        match &self.kind {
            TypeKind::Prim { prim, .. } => Some(*prim),
            _ => None,
        }
    }

    pub fn refinement(&self) -> (Option<&Rc<Expr>>, Option<&Rc<Expr>>) {
        match &self.kind {
            TypeKind::Prim { min, max, .. } => (min.as_ref(), max.as_ref()),
            _ => (None, None),
        }
    }

    pub fn is_bool(&self) -> bool {
        self.prim_kind() == Some(Prim::Bool)
    }

    pub fn is_ideal(&self) -> bool {
        self.prim_kind() == Some(Prim::Ideal)
    }

    pub fn is_status(&self) -> bool {
        self.prim_kind() == Some(Prim::Status)
    }

    pub fn is_nullptr(&self) -> bool {
        self.prim_kind() == Some(Prim::Nullptr)
    }

    /// A concrete integer type (`i8..i64`, `u8..u64`); not `ideal`.
    pub fn is_num_type(&self) -> bool {
        self.prim_kind().is_some_and(|p| p.is_integer())
    }

    pub fn is_num_type_or_ideal(&self) -> bool {
        self.is_num_type() || self.is_ideal()
    }

    pub fn is_io_token_type(&self) -> bool {
        self.prim_kind() == Some(Prim::IoToken)
    }

    pub fn is_cpu_arch_type(&self) -> bool {
        self.prim_kind() == Some(Prim::CpuArch)
    }

    pub fn is_array_type(&self) -> bool {
        matches!(self.kind, TypeKind::Array { .. })
    }

    pub fn array_length(&self) -> Option<&Rc<Expr>> {
        match &self.kind {
            TypeKind::Array { length, .. } => Some(length),
            _ => None,
        }
    }

    pub fn is_slice_type(&self) -> bool {
        matches!(self.kind, TypeKind::Slice { .. })
    }

    pub fn is_slice_u8(&self) -> bool {
        match &self.kind {
            TypeKind::Slice { inner } => inner.prim_kind() == Some(Prim::U8),
            _ => false,
        }
    }

    pub fn is_ptr_type(&self) -> bool {
        matches!(self.kind, TypeKind::Ptr { .. })
    }

    pub fn is_nptr_type(&self) -> bool {
        matches!(self.kind, TypeKind::Nptr { .. })
    }

    pub fn is_func_type(&self) -> bool {
        matches!(self.kind, TypeKind::Func { .. })
    }

    pub fn func_receiver(&self) -> Option<&Rc<TypeExpr>> {
        match &self.kind {
            TypeKind::Func { receiver, .. } => Some(receiver),
            _ => None,
        }
    }

    pub fn func_name(&self) -> Option<Ident> {
        match &self.kind {
            TypeKind::Func { name, .. } => Some(*name),
            _ => None,
        }
    }

    pub fn inner(&self) -> Option<&Rc<TypeExpr>> {
        match &self.kind {
            TypeKind::Array { inner, .. }
            | TypeKind::Slice { inner }
            | TypeKind::Table { inner }
            | TypeKind::Ptr { inner }
            | TypeKind::Nptr { inner } => Some(inner),
            _ => None,
        }
    }

    pub fn mbounds(&self) -> Option<IntRange> {
        self.mbounds.borrow().clone()
    }

    pub fn set_mbounds(&self, b: IntRange) {
        *self.mbounds.borrow_mut() = Some(b);
    }

    pub fn str(&self, tm: &IdMap) -> String {
        match &self.kind {
            TypeKind::Prim { prim, min, max } => match (min, max) {
                (None, None) => prim.name().to_string(),
                (min, max) => {
                    let min = min.as_ref().map(|e| e.str(tm)).unwrap_or_default();
                    let max = max.as_ref().map(|e| e.str(tm)).unwrap_or_default();
                    format!("{}[{} ..= {}]", prim.name(), min, max)
                }
            },
            TypeKind::Array { inner, length } => {
                format!("array[{}] {}", length.str(tm), inner.str(tm))
            }
            TypeKind::Slice { inner } => format!("slice {}", inner.str(tm)),
            TypeKind::Table { inner } => format!("table {}", inner.str(tm)),
            TypeKind::Ptr { inner } => format!("ptr {}", inner.str(tm)),
            TypeKind::Nptr { inner } => format!("nptr {}", inner.str(tm)),
            TypeKind::Func { receiver, name } => {
                format!("func ({}).{}", receiver.str(tm), tm.name(*name))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssertKind {
    Assert,
    Pre,
    Inv,
    Post,
}

#[derive(Debug)]
pub struct Assert {
    pub keyword: AssertKind,
    pub condition: Rc<Expr>,
    pub reason: Option<Ident>,
    /// Named hypothesis arguments cited by a reason, e.g. `via "..."(c: x)`.
    pub args: Vec<(Ident, Rc<Expr>)>,
    pub line: u32,
}

#[derive(Debug)]
pub struct Assign {
    pub lhs: Option<Rc<Expr>>,
    pub op: AssignOp,
    pub rhs: Rc<Expr>,
    pub line: u32,
}

#[derive(Debug)]
pub struct If {
    pub condition: Rc<Expr>,
    pub body_if_true: Vec<Stmt>,
    /// Non-empty only for a final `else` block.
    pub body_if_false: Vec<Stmt>,
    pub else_if: Option<Rc<If>>,
    pub line: u32,
}

#[derive(Debug)]
pub struct While {
    pub condition: Rc<Expr>,
    pub asserts: Vec<Rc<Assert>>,
    pub body: Vec<Stmt>,
    pub line: u32,
}

#[derive(Debug)]
pub struct Iterate {
    pub assigns: Vec<Rc<Assign>>,
    pub length: u64,
    pub unroll: Rc<Expr>,
    pub body: Vec<Stmt>,
    pub else_iterate: Option<Rc<Iterate>>,
    pub line: u32,
}

#[derive(Debug)]
pub struct IoBind {
    pub io: Rc<Expr>,
    pub arg1: Rc<Expr>,
    pub body: Vec<Stmt>,
    pub line: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JumpKind {
    Break,
    Continue,
}

#[derive(Debug)]
pub struct Jump {
    pub keyword: JumpKind,
    /// The enclosing loop this jump targets. Weak because the loop's body
    /// contains the jump.
    pub target: Weak<While>,
    pub line: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetKind {
    Return,
    Yield,
}

#[derive(Debug)]
pub struct Ret {
    pub keyword: RetKind,
    pub value: Rc<Expr>,
    rets_error: Cell<bool>,
    pub line: u32,
}

impl Ret {
    pub fn new(keyword: RetKind, value: Rc<Expr>, line: u32) -> Rc<Ret> {
        Rc::new(Ret {
            keyword,
            value,
            rets_error: Cell::new(false),
            line,
        })
    }

    pub fn rets_error(&self) -> bool {
        self.rets_error.get()
    }

    pub fn set_rets_error(&self) {
        self.rets_error.set(true);
    }
}

#[derive(Debug)]
pub struct Var {
    pub name: Ident,
    pub xtype: Rc<TypeExpr>,
    pub line: u32,
}

#[derive(Debug)]
pub enum Stmt {
    Assert(Rc<Assert>),
    Assign(Rc<Assign>),
    If(Rc<If>),
    While(Rc<While>),
    Iterate(Rc<Iterate>),
    IoBind(Rc<IoBind>),
    Jump(Rc<Jump>),
    Ret(Rc<Ret>),
    Var(Rc<Var>),
}

impl Stmt {
    pub fn line(&self) -> u32 {
        match self {
            Stmt::Assert(n) => n.line,
            Stmt::Assign(n) => n.line,
            Stmt::If(n) => n.line,
            Stmt::While(n) => n.line,
            Stmt::Iterate(n) => n.line,
            Stmt::IoBind(n) => n.line,
            Stmt::Jump(n) => n.line,
            Stmt::Ret(n) => n.line,
            Stmt::Var(n) => n.line,
        }
    }
}

#[derive(Debug)]
pub struct Field {
    pub name: Ident,
    pub xtype: Rc<TypeExpr>,
}

#[derive(Debug)]
pub struct FuncDecl {
    pub name: Ident,
    pub receiver: Option<Rc<TypeExpr>>,
    pub in_fields: Vec<Field>,
    pub out: Option<Rc<TypeExpr>>,
    pub effect: Effect,
    /// Declared preconditions, assumed on entry ("in-facts").
    pub asserts: Vec<Rc<Assert>>,
    pub body: Vec<Stmt>,
    pub filename: String,
}

#[derive(Debug)]
pub struct ConstDecl {
    pub name: Ident,
    pub xtype: Rc<TypeExpr>,
    pub value: Rc<Expr>,
}

/// Whether a block always transfers control away: its last statement is a
/// plain `ret`, a `jump`, or an `if` chain with a final else whose every arm
/// terminates. `ret yield` suspends and resumes, so it does not terminate.
pub fn terminates(block: &[Stmt]) -> bool {
    match block.last() {
        Some(Stmt::Ret(n)) => n.keyword == RetKind::Return,
        Some(Stmt::Jump(_)) => true,
        Some(Stmt::If(n)) => if_terminates(n),
        _ => false,
    }
}

fn if_terminates(n: &If) -> bool {
    if !terminates(&n.body_if_true) {
        return false;
    }
    if !n.body_if_false.is_empty() {
        return terminates(&n.body_if_false);
    }
    match &n.else_if {
        Some(e) => if_terminates(e),
        None => false,
    }
}
