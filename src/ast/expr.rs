use super::pattern::Pattern;
use super::stmt::Stmt;
use crate::intern::Symbol;
use crate::token::Loc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
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
    Pow,
    Concat,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl BinaryOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::NotEq | BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq
        )
    }

    /// JavaScript spelling of the operator.
    pub fn js(self) -> &'static str {
        match self {
            BinaryOp::Add | BinaryOp::Concat => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "**",
            BinaryOp::Eq => "===",
            BinaryOp::NotEq => "!==",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
    Coalesce,
}

/// One piece of an interpolated string. A plain literal is a single `Text`.
#[derive(Debug)]
pub enum StrPart<'a> {
    Text(Symbol),
    Expr(&'a Expr<'a>),
}

#[derive(Debug)]
pub enum CallArg<'a> {
    Positional(&'a Expr<'a>),
    Spread(&'a Expr<'a>),
    Named { name: Symbol, value: &'a Expr<'a> },
}

impl<'a> CallArg<'a> {
    pub fn expr(&self) -> &'a Expr<'a> {
        match self {
            CallArg::Positional(e) | CallArg::Spread(e) => e,
            CallArg::Named { value, .. } => value,
        }
    }
}

/// Right-hand side of `|>`.
#[derive(Debug)]
pub enum PipeTarget<'a> {
    /// `x |> f(a, b)` — insert `x` first unless an `_` placeholder appears.
    Call(&'a Expr<'a>),
    /// `x |> .m(a)` — method call on the piped value.
    Method { name: Symbol, args: Vec<CallArg<'a>> },
    /// `x |> f` — bare callee.
    Bare(&'a Expr<'a>),
}

#[derive(Debug)]
pub struct Param<'a> {
    pub name: Symbol,
    pub ty: Option<Symbol>,
    pub default: Option<&'a Expr<'a>>,
    pub rest: bool,
    pub loc: Loc,
}

#[derive(Debug)]
pub struct MatchArm<'a> {
    pub pattern: &'a Pattern<'a>,
    pub guard: Option<&'a Expr<'a>>,
    pub body: &'a Expr<'a>,
    pub loc: Loc,
}

#[derive(Debug)]
pub struct IfBranch<'a> {
    pub cond: &'a Expr<'a>,
    pub body: &'a Expr<'a>,
}

#[derive(Debug)]
pub enum ArrayItem<'a> {
    Item(&'a Expr<'a>),
    Spread(&'a Expr<'a>),
}

#[derive(Debug)]
pub enum ObjectEntry<'a> {
    /// `key: value`; shorthand `{x}` parses with value `Ident(x)`.
    Field { key: Symbol, value: &'a Expr<'a> },
    /// Computed key `[expr]: value`.
    Computed { key: &'a Expr<'a>, value: &'a Expr<'a> },
    Spread(&'a Expr<'a>),
}

#[derive(Debug)]
pub enum CompClause<'a> {
    For { pattern: &'a Pattern<'a>, iterable: &'a Expr<'a> },
    If(&'a Expr<'a>),
}

// ---------------------------------------------------------------------------
// JSX
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum JsxAttrValue<'a> {
    Str(Symbol),
    Template(Vec<StrPart<'a>>),
    /// Boolean shorthand: attribute present without a value.
    Shorthand,
    Expr(&'a Expr<'a>),
}

#[derive(Debug)]
pub enum JsxAttr<'a> {
    /// Names may contain colons: `on:click`, `bind:value`, `class:active`.
    Named { name: Symbol, value: JsxAttrValue<'a>, loc: Loc },
    Spread { expr: &'a Expr<'a>, loc: Loc },
}

#[derive(Debug)]
pub enum JsxChild<'a> {
    Text(Symbol),
    Expr(&'a Expr<'a>),
    Element(&'a Expr<'a>),
    For {
        pattern: &'a Pattern<'a>,
        iterable: &'a Expr<'a>,
        key: Option<&'a Expr<'a>>,
        body: Vec<JsxChild<'a>>,
    },
    If {
        branches: Vec<(&'a Expr<'a>, Vec<JsxChild<'a>>)>,
        else_body: Option<Vec<JsxChild<'a>>>,
    },
}

// ---------------------------------------------------------------------------
// Expression node
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct Expr<'a> {
    pub kind: ExprKind<'a>,
    pub loc: Loc,
}

#[derive(Debug)]
pub enum ExprKind<'a> {
    Int(i64),
    Float(f64),
    /// String literal; interpolated strings carry expression parts.
    Str(Vec<StrPart<'a>>),
    RawStr(Symbol),
    Regex { pattern: Symbol, flags: Symbol },
    Bool(bool),
    Nil,
    Ident(Symbol),
    Unary { op: UnaryOp, operand: &'a Expr<'a> },
    Binary { op: BinaryOp, left: &'a Expr<'a>, right: &'a Expr<'a> },
    Logical { op: LogicalOp, left: &'a Expr<'a>, right: &'a Expr<'a> },
    /// `a < b < c` evaluated left-to-right, each subject evaluated once.
    ChainedCmp { first: &'a Expr<'a>, rest: Vec<(BinaryOp, &'a Expr<'a>)> },
    Member { object: &'a Expr<'a>, property: Symbol, optional: bool },
    Index { object: &'a Expr<'a>, index: &'a Expr<'a> },
    Slice {
        object: &'a Expr<'a>,
        start: Option<&'a Expr<'a>>,
        end: Option<&'a Expr<'a>>,
        step: Option<&'a Expr<'a>>,
    },
    Call { callee: &'a Expr<'a>, args: Vec<CallArg<'a>> },
    Pipe { value: &'a Expr<'a>, target: PipeTarget<'a> },
    Lambda { params: Vec<Param<'a>>, body: &'a Expr<'a>, is_async: bool },
    Match { subject: &'a Expr<'a>, arms: Vec<MatchArm<'a>> },
    If { branches: Vec<IfBranch<'a>>, else_body: Option<&'a Expr<'a>> },
    /// Block expression: statements plus an optional trailing expression value.
    Block(Vec<&'a Stmt<'a>>),
    Yield { value: Option<&'a Expr<'a>>, delegate: bool },
    Await(&'a Expr<'a>),
    /// `expr?` early-return sugar.
    Propagate(&'a Expr<'a>),
    Array(Vec<ArrayItem<'a>>),
    Object(Vec<ObjectEntry<'a>>),
    ListComp { element: &'a Expr<'a>, clauses: Vec<CompClause<'a>> },
    DictComp { key: &'a Expr<'a>, value: &'a Expr<'a>, clauses: Vec<CompClause<'a>> },
    Tuple(Vec<&'a Expr<'a>>),
    Range { start: &'a Expr<'a>, end: &'a Expr<'a>, inclusive: bool },
    Jsx { tag: Symbol, attrs: Vec<JsxAttr<'a>>, children: Vec<JsxChild<'a>> },
    JsxFragment { children: Vec<JsxChild<'a>> },
}

impl<'a> Expr<'a> {
    /// True when the expression is the bare placeholder `_`.
    pub fn is_placeholder(&self, interner: &crate::intern::Interner) -> bool {
        matches!(self.kind, ExprKind::Ident(sym) if interner.resolve(sym) == "_")
    }
}
