use crate::arena::Arena;
use crate::ast::{Expr, ExprKind, Pattern, PatternKind, Stmt, StmtKind};
use crate::token::Loc;

/// Bundle of arena handles threaded through the parser. One context per
/// compilation; every AST node is allocated through it.
#[derive(Clone, Copy)]
pub struct AstContext<'a> {
    pub exprs: &'a Arena<Expr<'a>>,
    pub stmts: &'a Arena<Stmt<'a>>,
    pub pats: &'a Arena<Pattern<'a>>,
}

impl<'a> AstContext<'a> {
    pub fn new(
        exprs: &'a Arena<Expr<'a>>,
        stmts: &'a Arena<Stmt<'a>>,
        pats: &'a Arena<Pattern<'a>>,
    ) -> Self {
        AstContext { exprs, stmts, pats }
    }

    #[inline]
    pub fn expr(&self, kind: ExprKind<'a>, loc: Loc) -> &'a Expr<'a> {
        self.exprs.alloc(Expr { kind, loc })
    }

    #[inline]
    pub fn stmt(&self, kind: StmtKind<'a>, loc: Loc) -> &'a Stmt<'a> {
        self.stmts.alloc(Stmt { kind, loc })
    }

    #[inline]
    pub fn pat(&self, kind: PatternKind<'a>, loc: Loc) -> &'a Pattern<'a> {
        self.pats.alloc(Pattern { kind, loc })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::Loc;

    #[test]
    fn context_allocates_nodes() {
        let exprs = Arena::new();
        let stmts = Arena::new();
        let pats = Arena::new();
        let ctx = AstContext::new(&exprs, &stmts, &pats);
        let loc = Loc::default();
        let lhs = ctx.expr(ExprKind::Int(1), loc);
        let rhs = ctx.expr(ExprKind::Int(2), loc);
        let sum = ctx.expr(
            ExprKind::Binary { op: crate::ast::BinaryOp::Add, left: lhs, right: rhs },
            loc,
        );
        match sum.kind {
            ExprKind::Binary { left, right, .. } => {
                assert!(matches!(left.kind, ExprKind::Int(1)));
                assert!(matches!(right.kind, ExprKind::Int(2)));
            }
            _ => panic!("expected binary node"),
        }
    }
}
