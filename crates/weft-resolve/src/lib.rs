// Weft resolver core -- finds minimum-cost typed interpretations of
// untyped call expressions over a set of overloaded, possibly polymorphic
// declarations.

pub mod assertions;
pub mod bu;
pub mod cache;
pub mod combos;
pub mod conversion;
pub mod cost;
pub mod env;
pub mod expand;
pub mod func_table;
pub mod interpretation;
pub mod persist;
pub mod resolver;
pub mod td;
pub mod texpr;
pub mod type_map;
pub mod unify;

pub use conversion::ConversionGraph;
pub use cost::Cost;
pub use env::{ClassRef, Env, TypeClass};
pub use func_table::FuncTable;
pub use interpretation::Interpretation;
pub use resolver::{ResolveFailure, Resolver, ResolverMode, SearchDir};
pub use texpr::TypedExpr;
pub use type_map::TypeMap;
