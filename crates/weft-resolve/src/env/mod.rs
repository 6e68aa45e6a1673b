//! Type-variable environments.
//!
//! An environment groups type variables into equivalence classes, each
//! with an optional bound type, and records assertion bindings. Two
//! backends implement the same contract: `flat` stores classes by value
//! and is the default; `penv` shares structure persistently across
//! speculative branches. The active backend is chosen at compile time by
//! the `persistent-env` cargo feature, and `Env`/`ClassRef` alias it.

use weft_ast::ty::{PolyVar, Ty};

pub mod flat;
pub mod penv;

#[cfg(not(feature = "persistent-env"))]
pub use flat::{ClassRef, Env};
#[cfg(feature = "persistent-env")]
pub use penv::{ClassRef, Env};

/// An equivalence class of type variables with an optional bound.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TypeClass {
    pub vars: Vec<PolyVar>,
    pub bound: Option<Ty>,
}

impl std::fmt::Display for TypeClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.vars.len() == 1 {
            write!(f, "{}", self.vars[0])?;
        } else {
            write!(f, "[")?;
            for (i, v) in self.vars.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{v}")?;
            }
            write!(f, "]")?;
        }
        write!(f, " => ")?;
        match &self.bound {
            Some(b) => write!(f, "{b}"),
            None => write!(f, "???"),
        }
    }
}

/// The variable-level operations the unifier needs from an environment.
/// Both backends implement this; keying on variables rather than class
/// references keeps callers valid across class merges.
pub trait EnvOps {
    /// The bound of the variable's class, if any.
    fn bound_for(&self, v: &PolyVar) -> Option<Ty>;

    /// Ensures a (possibly singleton) class exists for the variable.
    fn ensure_var(&mut self, v: &PolyVar);

    /// Binds the variable's class to a type; fails the occurs check.
    fn bind_var_type(&mut self, v: &PolyVar, ty: Ty) -> bool;

    /// Unions two variables' classes, merging bounds; fails on conflict.
    fn unite(&mut self, a: &PolyVar, b: &PolyVar) -> bool;
}
