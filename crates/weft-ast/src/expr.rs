//! Untyped input expressions.
//!
//! These are what the parser produces and the resolver consumes: type
//! literals, `&name` references, and nested call expressions. Nodes are
//! shared behind `Rc` so the interpretation cache can key on identity.

use std::fmt;
use std::rc::Rc;

use crate::ty::Ty;

/// An unresolved expression.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Expr {
    /// A single value of a known type.
    Val(Ty),
    /// A reference to a named declaration.
    Name(String),
    /// An untyped call of a named function.
    Call { name: String, args: Vec<Rc<Expr>> },
}

impl Expr {
    pub fn call(name: impl Into<String>, args: Vec<Rc<Expr>>) -> Rc<Expr> {
        Rc::new(Expr::Call { name: name.into(), args })
    }

    pub fn val(ty: Ty) -> Rc<Expr> {
        Rc::new(Expr::Val(ty))
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Val(ty) => write!(f, "{}", ty.plain()),
            Expr::Name(name) => write!(f, "&{name}"),
            Expr::Call { name, args } => {
                write!(f, "{name}(")?;
                for a in args {
                    write!(f, " {a}")?;
                }
                write!(f, " )")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_input_form() {
        let e = Expr::call(
            "f",
            vec![Expr::val(Ty::Conc(1)), Rc::new(Expr::Name("g".into()))],
        );
        assert_eq!(e.to_string(), "f( 1 &g )");
    }
}
