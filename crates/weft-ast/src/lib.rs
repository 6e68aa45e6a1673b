// Weft AST -- data model for the resolver's input language.

pub mod decl;
pub mod expr;
pub mod forall;
pub mod ty;

pub use decl::{FuncDecl, VarDecl};
pub use expr::Expr;
pub use forall::Forall;
pub use ty::{PolyVar, Ty};
