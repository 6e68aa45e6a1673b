//! Assertion resolution.
//!
//! Walks a resolved call tree post-order; at each call carrying a forall
//! clause, every assertion is substituted through the current
//! environment and resolved as a call of its own. A unique satisfying
//! interpretation commits immediately; multiple candidates are deferred
//! and disambiguated together once the whole tree has been seen, by
//! filtering their cartesian product through environment merging and
//! committing a unique cost minimum.

use std::rc::Rc;

use weft_ast::decl::FuncDecl;
use weft_ast::expr::Expr;

use crate::combos::{self, ComboIter, ComboResult};
use crate::cost::Cost;
use crate::env::Env;
use crate::interpretation::Interpretation;
use crate::resolver::{Resolver, ResolverMode, MAX_ASSERTION_DEPTH};
use crate::texpr::TypedExpr;

/// Resolves all assertions in `call`, accumulating their cost and
/// bindings; returns false (dropping the candidate) if any assertion has
/// no consistent satisfying interpretation.
pub fn resolve_assertions(
    r: &mut Resolver,
    call: &mut Rc<TypedExpr>,
    cost: &mut Cost,
    env: &mut Env,
) -> bool {
    let mut ar = AssertionResolver {
        resolver: r,
        cost,
        env,
        defer_ids: Vec::new(),
        deferred: Vec::new(),
    };
    match ar.mutate(call.clone()) {
        Some(new) => {
            *call = new;
            true
        }
        None => false,
    }
}

/// A fully merged combination of deferred assertion candidates.
struct Compatible {
    env: Env,
    cost: Cost,
    combo: Vec<Rc<Interpretation>>,
}

/// Combo filter that merges candidate environments incrementally,
/// rejecting any prefix whose environments conflict.
struct EnvMerger {
    crnt: Vec<Rc<Interpretation>>,
    envs: Vec<Env>,
}

impl EnvMerger {
    fn new(base: Env) -> Self {
        EnvMerger { crnt: Vec::new(), envs: vec![base] }
    }

    fn top(&self) -> &Env {
        self.envs.last().expect("merger always keeps the base environment")
    }
}

impl ComboIter<Rc<Interpretation>> for EnvMerger {
    type Out = Compatible;

    fn append(&mut self, i: &Rc<Interpretation>) -> ComboResult {
        let mut env = self.top().clone();
        if !env.merge(&i.env) {
            return ComboResult::RejectThis;
        }
        self.crnt.push(i.clone());
        self.envs.push(env);
        ComboResult::Accept
    }

    fn backtrack(&mut self) {
        self.crnt.pop();
        self.envs.pop();
    }

    fn finalize(&mut self) -> Compatible {
        Compatible {
            env: self.top().clone(),
            cost: self.crnt.iter().fold(Cost::zero(), |k, i| k + i.cost),
            combo: self.crnt.clone(),
        }
    }
}

struct AssertionResolver<'r, 'a> {
    resolver: &'r mut Resolver<'a>,
    cost: &'r mut Cost,
    env: &'r mut Env,
    /// Assertions whose candidates were deferred.
    defer_ids: Vec<Rc<FuncDecl>>,
    /// Candidate lists for the deferred assertions, in the same order.
    deferred: Vec<Vec<Rc<Interpretation>>>,
}

impl AssertionResolver<'_, '_> {
    /// Full resolution of one tree: the post-order walk plus deferred
    /// disambiguation.
    fn mutate(&mut self, e: Rc<TypedExpr>) -> Option<Rc<TypedExpr>> {
        let out = self.visit(&e)?;

        if self.deferred.is_empty() {
            return Some(out);
        }

        let mut compatible =
            combos::filter_combos(&self.deferred, EnvMerger::new(self.env.clone()));
        if compatible.is_empty() {
            return None;
        }

        let min_pos = combos::sort_mins(&mut compatible, |a, b| a.cost < b.cost);
        if min_pos > 0 {
            // multiple minimum-cost combinations stay ambiguous
            return None;
        }

        let best = &compatible[0];
        if !self.env.merge(&best.env) {
            return None;
        }
        *self.cost += best.cost;
        for (assn, chosen) in self.defer_ids.iter().zip(&best.combo) {
            self.env.bind_assertion(assn, chosen.expr.clone());
        }
        self.deferred.clear();
        self.defer_ids.clear();
        Some(out)
    }

    /// Post-order traversal; `None` kills the candidate.
    fn visit(&mut self, e: &Rc<TypedExpr>) -> Option<Rc<TypedExpr>> {
        match &**e {
            TypedExpr::Val(_) | TypedExpr::Var(_) => Some(e.clone()),
            TypedExpr::Cast { arg, to } => {
                let new = self.visit(arg)?;
                if Rc::ptr_eq(&new, arg) {
                    Some(e.clone())
                } else {
                    Some(Rc::new(TypedExpr::Cast { arg: new, to: to.clone() }))
                }
            }
            TypedExpr::Truncate { arg, to } => {
                let new = self.visit(arg)?;
                if Rc::ptr_eq(&new, arg) {
                    Some(e.clone())
                } else {
                    Some(Rc::new(TypedExpr::Truncate { arg: new, to: to.clone() }))
                }
            }
            TypedExpr::TupleElem { of, index } => {
                let new = self.visit(of)?;
                if Rc::ptr_eq(&new, of) {
                    Some(e.clone())
                } else {
                    Some(Rc::new(TypedExpr::TupleElem { of: new, index: *index }))
                }
            }
            TypedExpr::Tuple { els, .. } => {
                let new = self.visit_list(els)?;
                match new {
                    None => Some(e.clone()),
                    Some(els) => Some(Rc::new(TypedExpr::tuple(els))),
                }
            }
            TypedExpr::Call { .. } => self.visit_call(e),
            TypedExpr::Ambiguous { .. } => self.visit_ambiguous(e),
        }
    }

    /// Visits a child list; outer `None` kills the candidate, inner
    /// `None` means no child changed.
    #[allow(clippy::option_option)]
    fn visit_list(&mut self, els: &[Rc<TypedExpr>]) -> Option<Option<Vec<Rc<TypedExpr>>>> {
        let mut changed: Option<Vec<Rc<TypedExpr>>> = None;
        for (i, el) in els.iter().enumerate() {
            let new = self.visit(el)?;
            if !Rc::ptr_eq(&new, el) {
                changed.get_or_insert_with(|| els[..i].to_vec()).push(new);
            } else if let Some(out) = changed.as_mut() {
                out.push(new);
            }
        }
        Some(changed)
    }

    fn visit_call(&mut self, e: &Rc<TypedExpr>) -> Option<Rc<TypedExpr>> {
        let TypedExpr::Call { func, args, forall, ret } = &**e else {
            return Some(e.clone());
        };

        // children first
        let node = match self.visit_list(args)? {
            Some(new_args) => Rc::new(TypedExpr::Call {
                func: func.clone(),
                args: new_args,
                forall: forall.clone(),
                ret: ret.clone(),
            }),
            None => e.clone(),
        };

        let Some(forall) = forall else { return Some(node) };

        for assn in forall.assertions() {
            // build a targeted query from the substituted signature
            let asn_args: Vec<Rc<Expr>> = assn
                .params()
                .iter()
                .map(|p| Expr::val(self.env.substitute(p)))
                .collect();
            let asn_expr = Expr::call(assn.name(), asn_args);
            let asn_ret = self.env.substitute(assn.returns());

            if self.resolver.assn_depth >= MAX_ASSERTION_DEPTH {
                // treat over-deep recursion as unsatisfiable
                return None;
            }
            self.resolver.assn_depth += 1;
            let satisfying = assertion_query(self.resolver, &asn_expr, &asn_ret, self.env);
            self.resolver.assn_depth -= 1;

            match satisfying.len() {
                0 => return None,
                1 => {
                    let s = &satisfying[0];
                    if !self.env.merge(&s.env) {
                        return None;
                    }
                    *self.cost += s.cost;
                    self.env.bind_assertion(assn, s.expr.clone());
                }
                _ => {
                    self.defer_ids.push(assn.clone());
                    self.deferred.push(satisfying);
                }
            }
        }

        // every variable of the clause must exist in the environment
        for v in forall.variables() {
            self.env.insert_var(v);
        }

        Some(node)
    }

    /// Narrows an ambiguous node to its minimum-cost resolvable
    /// alternatives.
    fn visit_ambiguous(&mut self, e: &Rc<TypedExpr>) -> Option<Rc<TypedExpr>> {
        let TypedExpr::Ambiguous { source, ty, alts } = &**e else {
            return Some(e.clone());
        };

        let mut unchanged = true;
        let mut min_cost = Cost::max();
        let mut min_env: Option<Env> = None;
        let mut min_alts: Vec<Rc<Interpretation>> = Vec::new();

        for alt in alts {
            let mut alt_cost = *self.cost;
            let mut alt_env = self.env.clone();
            let new_expr = {
                let mut sub = AssertionResolver {
                    resolver: &mut *self.resolver,
                    cost: &mut alt_cost,
                    env: &mut alt_env,
                    defer_ids: Vec::new(),
                    deferred: Vec::new(),
                };
                sub.mutate(alt.expr.clone())
            };

            let Some(new_expr) = new_expr else { continue };
            if !Rc::ptr_eq(&new_expr, &alt.expr) {
                unchanged = false;
            }

            let wrapped =
                Interpretation::with_cost(new_expr, alt_env.clone(), alt.cost, alt.arg_cost);
            if alt_cost < min_cost {
                min_cost = alt_cost;
                min_env = Some(alt_env);
                min_alts.clear();
                min_alts.push(wrapped);
            } else if alt_cost == min_cost {
                min_alts.push(wrapped);
            }
        }

        if min_alts.is_empty() {
            return None;
        }
        *self.cost = min_cost;

        if unchanged {
            return Some(e.clone());
        }

        if min_alts.len() == 1 {
            if let Some(me) = min_env {
                if !self.env.merge(&me) {
                    return None;
                }
            }
            return Some(min_alts[0].expr.clone());
        }

        Some(Rc::new(TypedExpr::Ambiguous {
            source: source.clone(),
            ty: ty.clone(),
            alts: min_alts,
        }))
    }
}

/// Targeted resolution of an assertion signature; assertions of the
/// satisfying declarations are checked in turn.
fn assertion_query(
    r: &mut Resolver,
    expr: &Rc<Expr>,
    target: &weft_ast::ty::Ty,
    env: &Env,
) -> Vec<Rc<Interpretation>> {
    match r.dir {
        crate::resolver::SearchDir::TopDown => crate::td::resolve_with_ext_type(
            r,
            expr,
            target,
            env,
            ResolverMode::default().with_assertions(),
        ),
        crate::resolver::SearchDir::BottomUp => {
            let mode = ResolverMode::default()
                .without_conversions()
                .with_void_as(target)
                .with_assertions();
            let results = crate::bu::resolve(r, expr, env, mode);
            crate::expand::convert_to_list(target, results, r.conversions)
        }
    }
}
