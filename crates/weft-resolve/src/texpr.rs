//! Typed expressions: the resolver's output language.
//!
//! Nodes are shared behind `Rc`; substitution and assertion resolution
//! rebuild only the spine they change. `Ambiguous` nodes carry the
//! equal-cost alternatives of a subexpression that later context may
//! still discriminate.

use std::fmt;
use std::rc::Rc;

use weft_ast::decl::{FuncDecl, VarDecl};
use weft_ast::forall::Forall;
use weft_ast::ty::Ty;

use crate::interpretation::Interpretation;

/// Output style for typed expressions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Style {
    /// Full detail: casts, forall clauses, variable instance ids.
    #[default]
    Default,
    /// Deterministic test output: no forall clauses or instance ids.
    Test,
}

/// A resolved, typed expression.
#[derive(Clone, Debug)]
pub enum TypedExpr {
    /// A value of a known type.
    Val(Ty),
    /// A reference to a declaration.
    Var(Rc<VarDecl>),
    /// A converting cast.
    Cast { arg: Rc<TypedExpr>, to: Ty },
    /// A truncating cast: trailing tuple elements (or the whole value)
    /// are discarded.
    Truncate { arg: Rc<TypedExpr>, to: Ty },
    /// A resolved call; `forall` owns the call's type-variable instances.
    Call {
        func: Rc<FuncDecl>,
        args: Vec<Rc<TypedExpr>>,
        forall: Option<Forall>,
        ret: Ty,
    },
    /// One element of a tuple-valued expression.
    TupleElem { of: Rc<TypedExpr>, index: usize },
    /// A tuple built from element expressions.
    Tuple { els: Vec<Rc<TypedExpr>>, ty: Ty },
    /// Equal-cost alternatives for one subexpression.
    Ambiguous {
        source: Rc<TypedExpr>,
        ty: Ty,
        alts: Vec<Rc<Interpretation>>,
    },
}

impl TypedExpr {
    /// The resolved type of this expression.
    pub fn ty(&self) -> &Ty {
        match self {
            TypedExpr::Val(ty) => ty,
            TypedExpr::Var(decl) => decl.ty(),
            TypedExpr::Cast { to, .. } | TypedExpr::Truncate { to, .. } => to,
            TypedExpr::Call { ret, .. } => ret,
            TypedExpr::TupleElem { of, index } => match of.ty() {
                Ty::Tuple(els) => &els[*index],
                _ => unreachable!("tuple element over non-tuple base"),
            },
            TypedExpr::Tuple { ty, .. } => ty,
            TypedExpr::Ambiguous { ty, .. } => ty,
        }
    }

    /// Truncates an expression to its first `n` components;
    /// `n` must be smaller than the expression's arity.
    pub fn truncate(arg: Rc<TypedExpr>, n: usize) -> TypedExpr {
        let to = match n {
            0 => Ty::Void,
            _ => match arg.ty() {
                Ty::Tuple(els) => Ty::from_list(els[..n].to_vec()),
                _ => unreachable!("multi-element truncation of a non-tuple"),
            },
        };
        TypedExpr::Truncate { arg, to }
    }

    /// A tuple expression; its type is computed from the elements.
    pub fn tuple(els: Vec<Rc<TypedExpr>>) -> TypedExpr {
        let ty = Ty::Tuple(els.iter().map(|e| e.ty().clone()).collect());
        TypedExpr::Tuple { els, ty }
    }

    pub fn is_ambiguous(&self) -> bool {
        matches!(self, TypedExpr::Ambiguous { .. })
    }

    /// The first `Ambiguous` node in the tree, if any.
    pub fn find_ambiguous(&self) -> Option<&TypedExpr> {
        match self {
            TypedExpr::Ambiguous { .. } => Some(self),
            TypedExpr::Val(_) | TypedExpr::Var(_) => None,
            TypedExpr::Cast { arg, .. } | TypedExpr::Truncate { arg, .. } => arg.find_ambiguous(),
            TypedExpr::TupleElem { of, .. } => of.find_ambiguous(),
            TypedExpr::Call { args, .. } => args.iter().find_map(|a| a.find_ambiguous()),
            TypedExpr::Tuple { els, .. } => els.iter().find_map(|e| e.find_ambiguous()),
        }
    }

    pub fn write(&self, f: &mut fmt::Formatter<'_>, style: Style) -> fmt::Result {
        match self {
            TypedExpr::Val(ty) => match style {
                Style::Default => write!(f, "{ty}"),
                Style::Test => write!(f, "{}", ty.plain()),
            },
            TypedExpr::Var(decl) => {
                write!(f, "&{}", decl.name())?;
                if !decl.tag().is_empty() {
                    write!(f, "-{}", decl.tag())?;
                }
                Ok(())
            }
            TypedExpr::Cast { arg, to } | TypedExpr::Truncate { arg, to } => {
                arg.write(f, style)?;
                match style {
                    Style::Default => write!(f, " => {to}"),
                    Style::Test => write!(f, " => {}", to.plain()),
                }
            }
            TypedExpr::Call { func, args, forall, .. } => {
                write!(f, "{}", func.name())?;
                if !func.tag().is_empty() {
                    write!(f, "-{}", func.tag())?;
                }
                if style == Style::Default {
                    if let Some(forall) = forall {
                        write!(f, "{forall}")?;
                    }
                }
                write!(f, "(")?;
                for a in args {
                    write!(f, " ")?;
                    a.write(f, style)?;
                }
                write!(f, " )")
            }
            TypedExpr::TupleElem { of, index } => {
                if *index == 0 {
                    of.write(f, style)?;
                }
                write!(f, "[{index}]")
            }
            TypedExpr::Tuple { els, .. } => {
                write!(f, "[")?;
                for e in els {
                    write!(f, " ")?;
                    e.write(f, style)?;
                }
                write!(f, " ]")
            }
            TypedExpr::Ambiguous { source, ty, .. } => {
                write!(f, "<ambiguous resolution of type ")?;
                match style {
                    Style::Default => write!(f, "{ty}")?,
                    Style::Test => write!(f, "{}", ty.plain())?,
                }
                write!(f, " for ")?;
                source.write(f, style)?;
                write!(f, ">")
            }
        }
    }

    /// Display adapter for test-style output.
    pub fn test_style(&self) -> TestStyle<'_> {
        TestStyle(self)
    }
}

impl fmt::Display for TypedExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write(f, Style::Default)
    }
}

pub struct TestStyle<'a>(&'a TypedExpr);

impl fmt::Display for TestStyle<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.write(f, Style::Test)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rc(e: TypedExpr) -> Rc<TypedExpr> {
        Rc::new(e)
    }

    #[test]
    fn truncate_builds_prefix_types() {
        let triple = rc(TypedExpr::Val(Ty::Tuple(vec![
            Ty::Conc(1),
            Ty::Conc(2),
            Ty::Conc(3),
        ])));
        assert_eq!(TypedExpr::truncate(triple.clone(), 0).ty(), &Ty::Void);
        assert_eq!(TypedExpr::truncate(triple.clone(), 1).ty(), &Ty::Conc(1));
        assert_eq!(
            TypedExpr::truncate(triple, 2).ty(),
            &Ty::Tuple(vec![Ty::Conc(1), Ty::Conc(2)])
        );
    }

    #[test]
    fn tuple_type_comes_from_elements() {
        let e = TypedExpr::tuple(vec![
            rc(TypedExpr::Val(Ty::Conc(1))),
            rc(TypedExpr::Val(Ty::Conc(2))),
        ]);
        assert_eq!(e.ty(), &Ty::Tuple(vec![Ty::Conc(1), Ty::Conc(2)]));
    }

    #[test]
    fn tuple_element_type_indexes_base() {
        let base = rc(TypedExpr::Val(Ty::Tuple(vec![Ty::Conc(1), Ty::Conc(2)])));
        let el = TypedExpr::TupleElem { of: base, index: 1 };
        assert_eq!(el.ty(), &Ty::Conc(2));
    }

    #[test]
    fn display_styles() {
        let cast = TypedExpr::Cast {
            arg: rc(TypedExpr::Val(Ty::Conc(1))),
            to: Ty::Conc(2),
        };
        assert_eq!(cast.to_string(), "1 => 2");
    }
}
