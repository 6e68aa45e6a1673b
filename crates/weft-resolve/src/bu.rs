//! Bottom-up interpretation search.
//!
//! Arguments are resolved first with no expected type; their
//! interpretation lists are combined into cost-ordered packs, and each
//! candidate declaration of matching arity is unified against the pack.

use std::rc::Rc;

use weft_ast::decl::FuncDecl;
use weft_ast::expr::Expr;
use weft_ast::forall::Forall;
use weft_ast::ty::Ty;

use crate::assertions;
use crate::combos;
use crate::cost::{poly_cost, Cost};
use crate::env::Env;
use crate::expand;
use crate::interpretation::Interpretation;
use crate::resolver::{Resolver, ResolverMode};
use crate::texpr::TypedExpr;
use crate::unify;

fn name_interps(r: &Resolver, name: &str, env: &Env) -> Vec<Rc<Interpretation>> {
    r.funcs
        .find_vars(name)
        .iter()
        .map(|d| Interpretation::new(Rc::new(TypedExpr::Var(d.clone())), env.clone()))
        .collect()
}

fn arity_candidates(r: &Resolver, name: &str, n: usize) -> Vec<Rc<FuncDecl>> {
    r.funcs
        .find(name)
        .map(|ix| ix.with_arity(n).to_vec())
        .unwrap_or_default()
}

/// Instantiated return and parameter types of a declaration.
fn instantiate_sig(func: &FuncDecl, forall: Option<&Forall>) -> (Ty, Vec<Ty>) {
    match forall {
        Some(f) => (f.apply(func.returns()), f.apply_all(func.params())),
        None => (func.returns().clone(), func.params().to_vec()),
    }
}

pub fn resolve(
    r: &mut Resolver,
    expr: &Rc<Expr>,
    env: &Env,
    mode: ResolverMode,
) -> Vec<Rc<Interpretation>> {
    let mut results = match &**expr {
        Expr::Val(ty) => {
            vec![Interpretation::new(Rc::new(TypedExpr::Val(ty.clone())), env.clone())]
        }
        Expr::Name(name) => name_interps(r, name, env),
        Expr::Call { name, args } => {
            if r.funcs.find(name).is_none() {
                Vec::new()
            } else {
                match args.len() {
                    0 => match_nullary(r, name, env, mode),
                    1 => {
                        let subs = resolve(r, &args[0], env, ResolverMode::default());
                        match_unary(r, name, subs, mode)
                    }
                    _ => {
                        let mut sub_results = Vec::new();
                        let mut dead = false;
                        for a in args {
                            let subs = resolve(r, a, env, ResolverMode::default());
                            if subs.is_empty() {
                                dead = true;
                                break;
                            }
                            sub_results.push(subs);
                        }
                        if dead {
                            Vec::new()
                        } else {
                            // reject combinations containing ambiguous
                            // sub-interpretations
                            let merged = combos::unsorted_eager_merge(
                                &sub_results,
                                |i| i.cost,
                                |qs, inds| {
                                    qs.iter().zip(inds).all(|(q, &j)| !q[j].is_ambiguous())
                                },
                            );
                            match_combos(r, name, merged, env, mode)
                        }
                    }
                }
            }
        }
    };

    if mode.expand_conversions {
        expand::expand_conversions(&mut results, r.conversions);
    }
    results
}

/// Matches zero-argument calls against zero-parameter declarations.
fn match_nullary(
    r: &mut Resolver,
    name: &str,
    env: &Env,
    mode: ResolverMode,
) -> Vec<Rc<Interpretation>> {
    let mut results = Vec::new();
    for func in arity_candidates(r, name, 0) {
        if !mode.allow_void && func.returns().size() == 0 {
            continue;
        }
        let forall = Forall::instantiate(func.forall(), &mut r.id_src);
        let (ret, _) = instantiate_sig(&func, forall.as_ref());
        let mut call = Rc::new(TypedExpr::Call { func: func.clone(), args: Vec::new(), forall, ret });
        let mut cost = poly_cost(&func);
        let mut c_env = env.clone();
        if mode.check_assertions
            && !assertions::resolve_assertions(r, &mut call, &mut cost, &mut c_env)
        {
            continue;
        }
        results.push(Interpretation::with_cost(call, c_env, cost, Cost::zero()));
    }
    results
}

/// Matches single-argument calls: each argument interpretation selects
/// the arity bucket by its own arity.
fn match_unary(
    r: &mut Resolver,
    name: &str,
    args: Vec<Rc<Interpretation>>,
    mode: ResolverMode,
) -> Vec<Rc<Interpretation>> {
    let mut results = Vec::new();

    for arg in args {
        let n = arg.type_of().size();
        for func in arity_candidates(r, name, n) {
            if !mode.allow_void && func.returns().size() == 0 {
                continue;
            }

            let mut cost = poly_cost(&func) + arg.cost;
            let mut env = arg.env.clone();
            let forall = Forall::instantiate(func.forall(), &mut r.id_src);
            let (ret, params) = instantiate_sig(&func, forall.as_ref());

            let arg_ty = arg.type_of().clone();
            let matched = arg_ty
                .components()
                .iter()
                .zip(&params)
                .all(|(at, pt)| unify::unify(pt, at, &mut cost, &mut env));
            if !matched {
                continue;
            }

            let mut call = Rc::new(TypedExpr::Call {
                func: func.clone(),
                args: vec![arg.expr.clone()],
                forall,
                ret,
            });
            if mode.check_assertions
                && !assertions::resolve_assertions(r, &mut call, &mut cost, &mut env)
            {
                continue;
            }
            results.push(Interpretation::with_cost(call, env, cost, arg.cost));
        }
    }
    results
}

/// Matches multi-argument calls against eagerly merged argument packs.
fn match_combos(
    r: &mut Resolver,
    name: &str,
    packs: Vec<(Cost, Vec<Rc<Interpretation>>)>,
    env: &Env,
    mode: ResolverMode,
) -> Vec<Rc<Interpretation>> {
    let mut results = Vec::new();

    for (pack_cost, pack) in packs {
        let n: usize = pack.iter().map(|a| a.type_of().size()).sum();
        for func in arity_candidates(r, name, n) {
            if !mode.allow_void && func.returns().size() == 0 {
                continue;
            }

            let mut cost = poly_cost(&func) + pack_cost;
            let mut c_env = env.clone();
            let forall = Forall::instantiate(func.forall(), &mut r.id_src);
            let (ret, params) = instantiate_sig(&func, forall.as_ref());

            if !unify::unify_list(&params, &pack, &mut cost, &mut c_env) {
                continue;
            }

            let call_args: Vec<Rc<TypedExpr>> = pack.iter().map(|i| i.expr.clone()).collect();
            let mut call = Rc::new(TypedExpr::Call {
                func: func.clone(),
                args: call_args,
                forall,
                ret,
            });
            if mode.check_assertions
                && !assertions::resolve_assertions(r, &mut call, &mut cost, &mut c_env)
            {
                continue;
            }
            results.push(Interpretation::with_cost(call, c_env, cost, pack_cost));
        }
    }
    results
}
