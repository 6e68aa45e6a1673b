//! Resolver state and the top-level resolution entry point.
//!
//! `Resolver` owns the fresh-variable counter, the interpretation cache,
//! and the chosen search direction; `resolve_expr` drives a full
//! resolution and classifies the outcome as a unique interpretation or
//! one of the three failure effects.

use std::rc::Rc;

use weft_ast::expr::Expr;
use weft_ast::ty::Ty;

use crate::bu;
use crate::cache::ArgCache;
use crate::combos;
use crate::conversion::ConversionGraph;
use crate::env::{Env, TypeClass};
use crate::expand;
use crate::func_table::FuncTable;
use crate::interpretation::Interpretation;
use crate::td;
use crate::texpr::TypedExpr;

/// Which search algorithm drives interpretation of call expressions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SearchDir {
    /// Expected types flow down from the caller.
    #[default]
    TopDown,
    /// Argument combinations are enumerated upwards.
    BottomUp,
}

/// Flags controlling one resolution step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResolverMode {
    /// Expand each result by its conversions.
    pub expand_conversions: bool,
    /// Admit interpretations of void type.
    pub allow_void: bool,
    /// Resolve assertions on constructed calls.
    pub check_assertions: bool,
    /// Truncate over-long tuples to fit.
    pub truncate: bool,
}

impl Default for ResolverMode {
    fn default() -> Self {
        ResolverMode {
            expand_conversions: true,
            allow_void: false,
            check_assertions: false,
            truncate: true,
        }
    }
}

impl ResolverMode {
    /// Flags for a top-level resolution: no expansion, void admitted,
    /// assertions checked.
    pub fn top_level() -> Self {
        ResolverMode {
            expand_conversions: false,
            allow_void: true,
            check_assertions: true,
            truncate: true,
        }
    }

    pub fn without_conversions(mut self) -> Self {
        self.expand_conversions = false;
        self
    }

    pub fn with_void(mut self) -> Self {
        self.allow_void = true;
        self
    }

    /// Admit void interpretations iff the target type is itself void.
    pub fn with_void_as(mut self, target: &Ty) -> Self {
        self.allow_void = target.size() == 0;
        self
    }

    pub fn with_assertions(mut self) -> Self {
        self.check_assertions = true;
        self
    }

    pub fn with_assertions_if(mut self, check: bool) -> Self {
        self.check_assertions = check;
        self
    }

    pub fn without_assertions(mut self) -> Self {
        self.check_assertions = false;
        self
    }

    pub fn without_truncation(mut self) -> Self {
        self.truncate = false;
        self
    }

    /// Packed form for cache keys.
    pub fn bits(self) -> u8 {
        u8::from(self.expand_conversions)
            | u8::from(self.allow_void) << 1
            | u8::from(self.check_assertions) << 2
            | u8::from(self.truncate) << 3
    }
}

/// A failed top-level resolution.
#[derive(Debug)]
pub enum ResolveFailure {
    /// No interpretation exists.
    Invalid,
    /// Multiple minimum-cost interpretations; the candidates are kept
    /// for reporting.
    Ambiguous(Vec<Rc<Interpretation>>),
    /// The best interpretation leaves type classes unbound.
    Unbound(Vec<TypeClass>),
}

/// Cap on re-entrant assertion resolution depth; past this an assertion
/// reports no candidates instead of recursing further.
pub const MAX_ASSERTION_DEPTH: u32 = 8;

/// State for resolving a batch of expressions over one declaration set.
pub struct Resolver<'a> {
    pub conversions: &'a ConversionGraph,
    pub funcs: &'a FuncTable,
    pub dir: SearchDir,
    /// Source of fresh type-variable instance ids.
    pub(crate) id_src: u32,
    /// Current assertion re-entrancy depth.
    pub(crate) assn_depth: u32,
    pub(crate) cache: ArgCache,
}

impl<'a> Resolver<'a> {
    pub fn new(conversions: &'a ConversionGraph, funcs: &'a FuncTable, dir: SearchDir) -> Self {
        Resolver {
            conversions,
            funcs,
            dir,
            id_src: 0,
            assn_depth: 0,
            cache: ArgCache::new(),
        }
    }

    /// All interpretations of `expr` under `env`, expanded by
    /// conversions when the mode asks for it.
    pub fn resolve(
        &mut self,
        expr: &Rc<Expr>,
        env: &Env,
        mode: ResolverMode,
    ) -> Vec<Rc<Interpretation>> {
        match self.dir {
            SearchDir::TopDown => td::resolve(self, expr, env, mode),
            SearchDir::BottomUp => bu::resolve(self, expr, env, mode),
        }
    }

    /// Interpretations of `expr` whose type is (convertible to) the
    /// target type, at minimum cost per reachable type.
    pub fn resolve_with_type(
        &mut self,
        expr: &Rc<Expr>,
        target: &Ty,
        env: &Env,
    ) -> Vec<Rc<Interpretation>> {
        match self.dir {
            SearchDir::TopDown => {
                td::resolve_with_ext_type(self, expr, target, env, ResolverMode::default())
            }
            SearchDir::BottomUp => {
                let mode = ResolverMode::default()
                    .without_conversions()
                    .with_void_as(target);
                let results = bu::resolve(self, expr, env, mode);
                expand::convert_to_list(target, results, self.conversions)
            }
        }
    }

    /// Resolves one input expression to its unique best interpretation,
    /// or reports why there is none.
    pub fn resolve_expr(&mut self, expr: &Rc<Expr>) -> Result<Rc<Interpretation>, ResolveFailure> {
        let mut results = self.resolve(expr, &Env::new(), ResolverMode::top_level());

        if results.is_empty() {
            return Err(ResolveFailure::Invalid);
        }

        if results.len() > 1 {
            let min_pos = combos::sort_mins(&mut results, |a, b| {
                Interpretation::compare(a, b) == std::cmp::Ordering::Less
            });
            if min_pos > 0 {
                results.truncate(min_pos + 1);
                return Err(ResolveFailure::Ambiguous(results));
            }
        }

        let candidate = results.swap_remove(0);

        // ambiguity introduced below the top level (e.g. by expansion)
        if let Some(TypedExpr::Ambiguous { alts, .. }) = candidate.expr.find_ambiguous() {
            return Err(ResolveFailure::Ambiguous(alts.clone()));
        }

        let unbound = candidate.env.unbound();
        if !unbound.is_empty() {
            return Err(ResolveFailure::Unbound(unbound));
        }

        Ok(candidate)
    }
}
