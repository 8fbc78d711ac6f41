use super::expr::Expr;
use crate::intern::Symbol;
use crate::token::Loc;

#[derive(Debug)]
pub struct Pattern<'a> {
    pub kind: PatternKind<'a>,
    pub loc: Loc,
}

#[derive(Debug)]
pub struct ObjectPatEntry<'a> {
    pub key: Symbol,
    /// `None` for shorthand `{x}`; alias or nested pattern otherwise.
    pub pattern: Option<&'a Pattern<'a>>,
    pub default: Option<&'a Expr<'a>>,
}

#[derive(Debug)]
pub enum PatternKind<'a> {
    /// Number, string, bool, or nil literal.
    Literal(&'a Expr<'a>),
    Wildcard,
    Binding(Symbol),
    Variant { name: Symbol, args: Vec<&'a Pattern<'a>> },
    /// `"prefix" ++ rest`.
    StringConcat { prefix: Symbol, rest: Symbol },
    Array { items: Vec<&'a Pattern<'a>>, rest: Option<Symbol> },
    Object { entries: Vec<ObjectPatEntry<'a>>, rest: Option<Symbol> },
    Range { start: &'a Expr<'a>, end: &'a Expr<'a>, inclusive: bool },
}

impl<'a> Pattern<'a> {
    /// Names bound by this pattern, in source order.
    pub fn bound_names(&self, out: &mut Vec<(Symbol, Loc)>) {
        match &self.kind {
            PatternKind::Binding(name) => out.push((*name, self.loc)),
            PatternKind::Variant { args, .. } => {
                for p in args {
                    p.bound_names(out);
                }
            }
            PatternKind::StringConcat { rest, .. } => out.push((*rest, self.loc)),
            PatternKind::Array { items, rest } => {
                for p in items {
                    p.bound_names(out);
                }
                if let Some(r) = rest {
                    out.push((*r, self.loc));
                }
            }
            PatternKind::Object { entries, rest } => {
                for entry in entries {
                    match entry.pattern {
                        Some(p) => p.bound_names(out),
                        None => out.push((entry.key, self.loc)),
                    }
                }
                if let Some(r) = rest {
                    out.push((*r, self.loc));
                }
            }
            PatternKind::Literal(_) | PatternKind::Wildcard | PatternKind::Range { .. } => {}
        }
    }

    pub fn is_irrefutable(&self) -> bool {
        matches!(self.kind, PatternKind::Wildcard | PatternKind::Binding(_))
    }
}
