use super::expr::{Expr, Param};
use super::pattern::Pattern;
use crate::ast::BinaryOp;
use crate::intern::Symbol;
use crate::token::Loc;

/// Block is a sequence of statements.
pub type Block<'a> = Vec<&'a Stmt<'a>>;

/// Key/value configuration body shared by server and security leaf
/// declarations: `db { driver: "sqlite", path: "app.db" }`.
pub type Config<'a> = Vec<(Symbol, &'a Expr<'a>)>;

#[derive(Debug)]
pub struct FieldDef<'a> {
    pub name: Symbol,
    pub ty: Symbol,
    pub default: Option<&'a Expr<'a>>,
    pub loc: Loc,
}

#[derive(Debug)]
pub struct VariantDef<'a> {
    pub name: Symbol,
    pub fields: Vec<FieldDef<'a>>,
    pub loc: Loc,
}

#[derive(Debug)]
pub enum TypeBody<'a> {
    Struct(Vec<FieldDef<'a>>),
    Enum(Vec<VariantDef<'a>>),
}

#[derive(Debug)]
pub struct FuncDecl<'a> {
    pub name: Symbol,
    pub type_params: Vec<Symbol>,
    pub params: Vec<Param<'a>>,
    pub ret_type: Option<Symbol>,
    pub body: Block<'a>,
    pub is_async: bool,
    pub is_pub: bool,
    pub is_generator: bool,
    pub doc: Option<Symbol>,
    pub loc: Loc,
}

/// Method signature inside `interface` / `trait`. Trait methods may carry a
/// default body.
#[derive(Debug)]
pub struct MethodSig<'a> {
    pub name: Symbol,
    pub params: Vec<Param<'a>>,
    pub ret_type: Option<Symbol>,
    pub default_body: Option<Block<'a>>,
    pub loc: Loc,
}

#[derive(Debug)]
pub enum RouteDecorator<'a> {
    Auth,
    Role(Symbol),
    RateLimit { max: i64, window: i64 },
    Timeout(i64),
    Custom { name: Symbol, args: Vec<&'a Expr<'a>> },
}

#[derive(Debug)]
pub struct RouteDecl<'a> {
    pub method: Symbol,
    pub path: Symbol,
    pub decorators: Vec<RouteDecorator<'a>>,
    pub handler: &'a Expr<'a>,
    pub doc: Option<Symbol>,
    pub loc: Loc,
}

#[derive(Debug)]
pub enum SecurityEntry<'a> {
    Auth { auth_type: Symbol, config: Config<'a>, loc: Loc },
    Role { name: Symbol, loc: Loc },
    Protect { pattern: Symbol, config: Config<'a>, loc: Loc },
    Sensitive { type_name: Symbol, field: Symbol, config: Config<'a>, loc: Loc },
    Cors { config: Config<'a>, loc: Loc },
    Csp { config: Config<'a>, loc: Loc },
    RateLimit { config: Config<'a>, loc: Loc },
    Csrf { config: Config<'a>, loc: Loc },
    Audit { config: Config<'a>, loc: Loc },
    TrustProxy { enabled: bool, loc: Loc },
    Hsts { config: Config<'a>, loc: Loc },
}

#[derive(Debug)]
pub struct Stmt<'a> {
    pub kind: StmtKind<'a>,
    pub loc: Loc,
}

#[derive(Debug)]
pub enum StmtKind<'a> {
    Expr(&'a Expr<'a>),
    /// `a = v` or tuple form `a, b = x, y`. Targets are identifier, member,
    /// or index expressions.
    Assign { targets: Vec<&'a Expr<'a>>, value: &'a Expr<'a> },
    VarDecl { name: Symbol, ty: Option<Symbol>, value: &'a Expr<'a> },
    /// Destructuring `let {x, y: alias = 0} = point`.
    LetDecl { pattern: &'a Pattern<'a>, value: &'a Expr<'a> },
    CompoundAssign { target: &'a Expr<'a>, op: BinaryOp, value: &'a Expr<'a> },
    Func(FuncDecl<'a>),
    TypeDecl {
        name: Symbol,
        type_params: Vec<Symbol>,
        body: TypeBody<'a>,
        derives: Vec<Symbol>,
        is_pub: bool,
        doc: Option<Symbol>,
    },
    TypeAlias {
        name: Symbol,
        type_params: Vec<Symbol>,
        target: Symbol,
        doc: Option<Symbol>,
    },
    Interface { name: Symbol, methods: Vec<MethodSig<'a>>, doc: Option<Symbol> },
    Trait { name: Symbol, methods: Vec<MethodSig<'a>>, doc: Option<Symbol> },
    Impl { trait_name: Option<Symbol>, type_name: Symbol, methods: Vec<FuncDecl<'a>> },
    Route(RouteDecl<'a>),
    Return(Option<&'a Expr<'a>>),
    If { branches: Vec<(&'a Expr<'a>, Block<'a>)>, else_body: Option<Block<'a>> },
    While { cond: &'a Expr<'a>, body: Block<'a> },
    For { pattern: &'a Pattern<'a>, iterable: &'a Expr<'a>, body: Block<'a> },
    Break,
    Continue,
    Guard { cond: &'a Expr<'a>, else_body: Block<'a> },
    Defer(Block<'a>),
    Import { names: Vec<(Symbol, Option<Symbol>)>, module: Symbol },

    // Target blocks
    ServerBlock { name: Option<Symbol>, decls: Block<'a> },
    ClientBlock { decls: Block<'a> },
    SharedBlock { decls: Block<'a> },
    SecurityBlock { entries: Vec<SecurityEntry<'a>> },
    TestBlock { name: Option<Symbol>, decls: Block<'a> },

    // Server-block leaf declarations
    Middleware { handler: &'a Expr<'a> },
    OnError { handler: &'a Expr<'a> },
    WsDecl { path: Symbol, config: Config<'a> },
    SseDecl { path: Symbol, handler: &'a Expr<'a> },
    HealthDecl { path: Symbol },
    StaticDecl { url_prefix: Symbol, dir: Symbol },
    ScheduleDecl { pattern: Symbol, handler: &'a Expr<'a> },
    BackgroundDecl(FuncDecl<'a>),
    DiscoverDecl { peer: Symbol, url: Symbol, config: Config<'a> },
    SessionDecl { config: Config<'a> },
    UploadDecl { path: Symbol, config: Config<'a> },
    MaxBodyDecl { bytes: i64 },
    CompressionDecl { config: Config<'a> },
    CacheDecl { config: Config<'a> },
    DbDecl { config: Config<'a> },
    TlsDecl { config: Config<'a> },
    EnvDecl { names: Vec<Symbol> },
    ModelDecl { type_name: Symbol, config: Config<'a> },

    // Client-block leaf declarations
    Component(FuncDecl<'a>),
    StateDecl { name: Symbol, value: &'a Expr<'a> },
    ComputedDecl { name: Symbol, value: &'a Expr<'a> },
    EffectDecl { body: Block<'a> },
    StoreDecl { name: Symbol, config: Config<'a> },
}

impl<'a> StmtKind<'a> {
    /// Leaf declarations legal only inside `server { … }`.
    pub fn is_server_only(&self) -> bool {
        matches!(
            self,
            StmtKind::Route(_)
                | StmtKind::Middleware { .. }
                | StmtKind::OnError { .. }
                | StmtKind::WsDecl { .. }
                | StmtKind::SseDecl { .. }
                | StmtKind::HealthDecl { .. }
                | StmtKind::StaticDecl { .. }
                | StmtKind::ScheduleDecl { .. }
                | StmtKind::BackgroundDecl(_)
                | StmtKind::DiscoverDecl { .. }
                | StmtKind::SessionDecl { .. }
                | StmtKind::UploadDecl { .. }
                | StmtKind::MaxBodyDecl { .. }
                | StmtKind::CompressionDecl { .. }
                | StmtKind::CacheDecl { .. }
                | StmtKind::DbDecl { .. }
                | StmtKind::TlsDecl { .. }
                | StmtKind::EnvDecl { .. }
                | StmtKind::ModelDecl { .. }
        )
    }

    /// Leaf declarations legal only inside `client { … }`.
    pub fn is_client_only(&self) -> bool {
        matches!(
            self,
            StmtKind::Component(_)
                | StmtKind::StateDecl { .. }
                | StmtKind::ComputedDecl { .. }
                | StmtKind::EffectDecl { .. }
                | StmtKind::StoreDecl { .. }
        )
    }
}
