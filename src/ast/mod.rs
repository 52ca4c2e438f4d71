pub mod expr;
pub mod stmt;
pub mod ty;

pub use expr::{BinaryOp, Expr, FStringPart, FormatSpec, UnaryOp};
pub use stmt::{
    Block, FuncDecl, Param, Program, SelectList, Stmt, StructDecl, StructField, UseDecl, UseKind,
};
pub use ty::TypeExpr;
