//! Statement and declaration nodes (spec §4.2 "Statements").

use crate::ast::expr::Expr;
use crate::ast::ty::TypeExpr;
use crate::span::Span;

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: TypeExpr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FuncDecl {
    pub name: String,
    pub params: Vec<Param>,
    pub return_type: TypeExpr,
    pub body: Block,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructField {
    pub name: String,
    pub ty: TypeExpr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructDecl {
    pub name: String,
    pub fields: Vec<StructField>,
    pub span: Span,
}

/// The three `use` forms from spec §4.5.
#[derive(Debug, Clone, PartialEq)]
pub enum UseKind {
    /// `use path` — import as a namespace named by the last path segment.
    Namespace,
    /// `use path as alias`
    Alias(String),
    /// `use path select name1, name2` or `use path select *`
    Select(SelectList),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectList {
    Names(Vec<String>),
    Wildcard,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UseDecl {
    pub path: Vec<String>,
    pub kind: UseKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Let { name: String, ty: TypeExpr, init: Expr, span: Span },
    Global { name: String, ty: TypeExpr, init: Expr, span: Span },
    Assign { target: Expr, value: Expr, span: Span },
    ExprStmt { expr: Expr, span: Span },
    If { cond: Expr, then_block: Block, else_block: Option<Block>, span: Span },
    While { cond: Expr, body: Block, span: Span },
    Return { value: Option<Expr>, span: Span },
    Break { span: Span },
    FuncDecl(FuncDecl),
    StructDecl(StructDecl),
    Use(UseDecl),
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::Let { span, .. }
            | Stmt::Global { span, .. }
            | Stmt::Assign { span, .. }
            | Stmt::ExprStmt { span, .. }
            | Stmt::If { span, .. }
            | Stmt::While { span, .. }
            | Stmt::Return { span, .. }
            | Stmt::Break { span } => *span,
            Stmt::FuncDecl(f) => f.span,
            Stmt::StructDecl(s) => s.span,
            Stmt::Use(u) => u.span,
        }
    }
}

/// A whole parsed source file: an ordered list of top-level statements.
pub type Program = Vec<Stmt>;
