//! Top-down interpretation search.
//!
//! The expected type flows down from the caller: candidate declarations
//! are enumerated through the return-type trie (exactly, through a
//! conversion to the target, or through a polymorphic match), and each
//! argument is then resolved against its parameter type. Arguments whose
//! type overruns a parameter carry the leftover tuple elements forward in
//! an `ArgPack` cursor, consuming them against later parameters.

use std::rc::Rc;

use weft_ast::decl::FuncDecl;
use weft_ast::expr::Expr;
use weft_ast::forall::Forall;
use weft_ast::ty::{PolyVar, Ty};

use crate::assertions;
use crate::cost::{poly_cost, Cost};
use crate::env::Env;
use crate::expand;
use crate::interpretation::Interpretation;
use crate::resolver::{Resolver, ResolverMode};
use crate::texpr::TypedExpr;
use crate::unify;

/// State for iteratively matching argument expressions to parameters.
#[derive(Clone)]
struct ArgPack {
    env: Env,
    cost: Cost,
    arg_cost: Cost,
    args: Vec<Rc<TypedExpr>>,
    /// Argument whose trailing tuple elements are still unconsumed.
    crnt: Option<Rc<TypedExpr>>,
    /// Count of unconsumed elements on `crnt`.
    on_last: usize,
    /// Index of the next argument expression.
    next: usize,
}

impl ArgPack {
    fn start(env: Env) -> ArgPack {
        ArgPack {
            env,
            cost: Cost::zero(),
            arg_cost: Cost::zero(),
            args: Vec::new(),
            crnt: None,
            on_last: 0,
            next: 0,
        }
    }

    /// Extends the pack with an interpretation of the next argument,
    /// noting leftover tuple elements.
    fn advance(&self, i: &Interpretation, leftover: usize) -> ArgPack {
        let mut args = self.args.clone();
        if let Some(c) = &self.crnt {
            args.push(c.clone());
        }
        if leftover == 0 {
            args.push(i.expr.clone());
        }
        ArgPack {
            env: i.env.clone(),
            cost: self.cost + i.cost,
            arg_cost: self.arg_cost + i.arg_cost,
            args,
            crnt: (leftover > 0).then(|| i.expr.clone()),
            on_last: leftover,
            next: self.next + 1,
        }
    }

    /// Consumes one more leftover element of the current argument.
    fn consume_leftover(&self, cost: Cost, env: Env) -> ArgPack {
        let leftover = self.on_last - 1;
        let mut args = self.args.clone();
        let crnt = if leftover > 0 {
            self.crnt.clone()
        } else {
            if let Some(c) = &self.crnt {
                args.push(c.clone());
            }
            None
        };
        ArgPack {
            env,
            cost,
            arg_cost: self.arg_cost,
            args,
            crnt,
            on_last: leftover,
            next: self.next,
        }
    }

    /// Closes out the current argument, truncating its unconsumed
    /// elements at one safe conversion each.
    fn truncate(&mut self) {
        if self.on_last == 0 {
            return;
        }
        if let Some(crnt) = self.crnt.take() {
            let kept = crnt.ty().size() - self.on_last;
            self.cost.safe += self.on_last as u32;
            self.args.push(Rc::new(TypedExpr::truncate(crnt, kept)));
        }
        self.on_last = 0;
    }
}

fn name_interps(r: &Resolver, name: &str, env: &Env) -> Vec<Rc<Interpretation>> {
    r.funcs
        .find_vars(name)
        .iter()
        .map(|d| Interpretation::new(Rc::new(TypedExpr::Var(d.clone())), env.clone()))
        .collect()
}

/// Instantiated return and parameter types of a declaration.
fn instantiate_sig(func: &FuncDecl, forall: Option<&Forall>) -> (Ty, Vec<Ty>) {
    match forall {
        Some(f) => (f.apply(func.returns()), f.apply_all(func.params())),
        None => (func.returns().clone(), func.params().to_vec()),
    }
}

/// Untargeted resolution: all interpretations of the expression.
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
            let decls: Vec<Rc<FuncDecl>> = r
                .funcs
                .find(name)
                .map(|ix| ix.all().to_vec())
                .unwrap_or_default();
            resolve_to_any(r, &decls, args, env, mode.without_conversions())
        }
    };

    if mode.expand_conversions {
        expand::expand_conversions(&mut results, r.conversions);
    }
    results
}

/// Resolves a call expression against a set of candidate declarations,
/// with no constraint on the return type.
fn resolve_to_any(
    r: &mut Resolver,
    funcs: &[Rc<FuncDecl>],
    args: &[Rc<Expr>],
    env: &Env,
    mode: ResolverMode,
) -> Vec<Rc<Interpretation>> {
    let mut results = Vec::new();

    for func in funcs {
        if !mode.allow_void && func.returns().size() == 0 {
            continue;
        }
        if func.params().len() < args.len() {
            continue;
        }
        // zero-parameter functions match only zero-argument calls
        if func.params().is_empty() != args.is_empty() {
            continue;
        }

        let forall = Forall::instantiate(func.forall(), &mut r.id_src);
        let (r_type, r_params) = instantiate_sig(func, forall.as_ref());

        match args.len() {
            0 => {
                let mut call = Rc::new(TypedExpr::Call {
                    func: func.clone(),
                    args: Vec::new(),
                    forall: forall.clone(),
                    ret: r_type.clone(),
                });
                let mut cost = poly_cost(func);
                let mut c_env = env.clone();
                if mode.check_assertions
                    && !assertions::resolve_assertions(r, &mut call, &mut cost, &mut c_env)
                {
                    continue;
                }
                results.push(Interpretation::with_cost(call, c_env, cost, Cost::zero()));
            }
            1 => {
                // the call's own assertion walk covers the argument tree
                let target = Ty::from_list(r_params.clone());
                let subs =
                    resolve_with_ext_type(r, &args[0], &target, env, mode.without_assertions());
                for sub in subs {
                    let mut call = Rc::new(TypedExpr::Call {
                        func: func.clone(),
                        args: vec![sub.expr.clone()],
                        forall: forall.clone(),
                        ret: r_type.clone(),
                    });
                    let mut s_env = sub.env.clone();
                    let mut cost = poly_cost(func) + sub.cost;
                    if mode.check_assertions
                        && !assertions::resolve_assertions(r, &mut call, &mut cost, &mut s_env)
                    {
                        continue;
                    }
                    results.push(Interpretation::with_cost(call, s_env, cost, sub.arg_cost));
                }
            }
            _ => {
                let mut combos = vec![ArgPack::start(env.clone())];
                let mut next_combos: Vec<ArgPack> = Vec::new();

                for param in &r_params {
                    debug_assert_eq!(param.size(), 1, "parameter lists are flattened");
                    for combo in &mut combos {
                        if combo.on_last > 0 {
                            // try to consume a leftover element of the
                            // previous argument against this parameter
                            if let Some(crnt) = &combo.crnt {
                                if let Ty::Tuple(els) = crnt.ty() {
                                    let ind = els.len() - combo.on_last;
                                    let crnt_ty = els[ind].clone();
                                    let mut c_cost = combo.cost;
                                    let mut c_env = combo.env.clone();
                                    if unify::unify(param, &crnt_ty, &mut c_cost, &mut c_env) {
                                        next_combos.push(combo.consume_leftover(c_cost, c_env));
                                    }
                                }
                            }
                            combo.truncate();
                        }
                        if combo.next == args.len() {
                            continue;
                        }
                        let c_env = combo.env.clone();
                        let subs = resolve_with_ext_type(
                            r,
                            &args[combo.next],
                            param,
                            &c_env,
                            mode.without_assertions().without_truncation(),
                        );
                        for i in subs {
                            let leftover = i.type_of().size().saturating_sub(1);
                            next_combos.push(combo.advance(&i, leftover));
                        }
                    }

                    std::mem::swap(&mut combos, &mut next_combos);
                    next_combos.clear();
                    if combos.is_empty() {
                        break;
                    }
                }

                for mut combo in combos {
                    if combo.next != args.len() {
                        continue;
                    }
                    combo.truncate();

                    let mut call = Rc::new(TypedExpr::Call {
                        func: func.clone(),
                        args: combo.args,
                        forall: forall.clone(),
                        ret: r_type.clone(),
                    });
                    let mut c_env = combo.env;
                    let mut cost = poly_cost(func) + combo.cost;
                    if mode.check_assertions
                        && !assertions::resolve_assertions(r, &mut call, &mut cost, &mut c_env)
                    {
                        continue;
                    }
                    results.push(Interpretation::with_cost(call, c_env, cost, combo.arg_cost));
                }
            }
        }
    }

    if mode.expand_conversions {
        expand::expand_conversions(&mut results, r.conversions);
    }
    results
}

/// Leaves of the return-type subtree rooted at `prefix`.
fn return_leaves(r: &Resolver, name: &str, prefix: &Ty) -> Vec<(Ty, Vec<Rc<FuncDecl>>)> {
    r.funcs
        .find(name)
        .and_then(|ix| ix.by_return().get(prefix))
        .map(|sub| sub.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        .unwrap_or_default()
}

/// Resolves a call with a fixed concrete target type.
fn resolve_to(
    r: &mut Resolver,
    name: &str,
    args: &[Rc<Expr>],
    target: &Ty,
    mode: ResolverMode,
) -> Vec<Rc<Interpretation>> {
    let mut results = Vec::new();

    // declarations whose return type has the target as a prefix
    for (key_ty, decls) in return_leaves(r, name, target) {
        let s_results = resolve_to_any(
            r,
            &decls,
            args,
            &Env::new(),
            mode.without_conversions().with_void_as(target),
        );
        if s_results.is_empty() {
            continue;
        }
        let trunc = mode.truncate && key_ty.size() > target.size();
        let mut s_cost = Cost::zero();
        if trunc {
            s_cost.safe += (key_ty.size() - target.size()) as u32;
        }
        for i in s_results {
            let s_expr = if trunc {
                Rc::new(TypedExpr::Truncate { arg: i.expr.clone(), to: target.clone() })
            } else {
                i.expr.clone()
            };
            results.push(Interpretation::with_cost(s_expr, i.env.clone(), i.cost + s_cost, i.cost));
        }
    }

    // declarations reaching the target through one conversion
    let convs: Vec<(Ty, Cost)> = r
        .conversions
        .find_to(target)
        .map(|c| (r.conversions.source(c).clone(), c.cost))
        .collect();
    for (from_ty, conv_cost) in convs {
        for (key_ty, decls) in return_leaves(r, name, &from_ty) {
            let s_results = resolve_to_any(r, &decls, args, &Env::new(), mode.without_conversions());
            if s_results.is_empty() {
                continue;
            }
            results.extend(cast_results(
                s_results, &key_ty, &from_ty, target, conv_cost, mode,
            ));
        }
    }

    // declarations with a polymorphic return type matching the target
    let poly_groups: Vec<Vec<(Ty, Vec<Rc<FuncDecl>>)>> = r
        .funcs
        .find(name)
        .map(|ix| {
            ix.by_return()
                .poly_matches(target)
                .into_iter()
                .filter(|(_, concrete)| !concrete)
                .map(|(sub, _)| sub.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
                .collect()
        })
        .unwrap_or_default();
    for group in poly_groups {
        for (key_ty, decls) in group {
            let s_results = resolve_to_any(r, &decls, args, &Env::new(), mode.without_conversions());
            if s_results.is_empty() {
                continue;
            }
            let n = target.size();
            let trunc = mode.truncate && key_ty.size() > n;
            let s_cost = if trunc {
                Cost::zero()
            } else {
                Cost::from_safe(key_ty.size().saturating_sub(n) as u32)
            };
            for i in s_results {
                let mut i_env = i.env.clone();
                let mut i_cost = i.cost;
                if !unify::unify(target, i.type_of(), &mut i_cost, &mut i_env) {
                    continue;
                }
                let s_expr = if trunc {
                    Rc::new(TypedExpr::truncate(i.expr.clone(), n))
                } else {
                    i.expr.clone()
                };
                results.push(Interpretation::with_cost(s_expr, i_env, i_cost + s_cost, i.cost));
            }
        }
    }

    results
}

/// Casts each result from `from_ty` to `to_ty`, truncating or
/// element-casting tuple results as needed.
fn cast_results(
    s_results: Vec<Rc<Interpretation>>,
    key_ty: &Ty,
    from_ty: &Ty,
    to_ty: &Ty,
    conv_cost: Cost,
    mode: ResolverMode,
) -> Vec<Rc<Interpretation>> {
    let kn = key_ty.size();
    let cn = from_ty.size();
    let trunc = mode.truncate && kn > cn;
    let mut s_cost = conv_cost;
    if trunc {
        s_cost.safe += (kn - cn) as u32;
    }

    let mut out = Vec::with_capacity(s_results.len());
    for i in s_results {
        let s_expr = if trunc {
            Rc::new(TypedExpr::Cast {
                arg: Rc::new(TypedExpr::Truncate { arg: i.expr.clone(), to: from_ty.clone() }),
                to: to_ty.clone(),
            })
        } else if kn > cn {
            // single-element conversion applied to a wider tuple result
            let mut els = Vec::with_capacity(kn);
            els.push(Rc::new(TypedExpr::Cast {
                arg: Rc::new(TypedExpr::TupleElem { of: i.expr.clone(), index: 0 }),
                to: to_ty.clone(),
            }));
            for j in 1..kn {
                els.push(Rc::new(TypedExpr::TupleElem { of: i.expr.clone(), index: j }));
            }
            Rc::new(TypedExpr::tuple(els))
        } else {
            Rc::new(TypedExpr::Cast { arg: i.expr.clone(), to: to_ty.clone() })
        };
        out.push(Interpretation::with_cost(s_expr, i.env.clone(), i.cost + s_cost, i.cost));
    }
    out
}

/// Resolves a call with a target type that still contains unbound type
/// variables.
fn resolve_to_poly(
    r: &mut Resolver,
    name: &str,
    args: &[Rc<Expr>],
    target: &Ty,
    mode: ResolverMode,
) -> Vec<Rc<Interpretation>> {
    let mut results = Vec::new();

    // declarations whose return type pattern-matches the target
    let groups: Vec<Vec<(Ty, Vec<Rc<FuncDecl>>)>> = r
        .funcs
        .find(name)
        .map(|ix| {
            ix.by_return()
                .matches(target)
                .into_iter()
                .map(|sub| sub.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
                .collect()
        })
        .unwrap_or_default();
    for group in groups {
        for (key_ty, decls) in group {
            let s_results = resolve_to_any(
                r,
                &decls,
                args,
                &Env::new(),
                mode.without_conversions().with_void_as(target),
            );
            if s_results.is_empty() {
                continue;
            }
            let trunc = mode.truncate && key_ty.size() > target.size();
            let mut s_cost = Cost::zero();
            if trunc {
                s_cost.safe += (key_ty.size() - target.size()) as u32;
            }
            for i in s_results {
                let s_expr = if trunc {
                    Rc::new(TypedExpr::Truncate { arg: i.expr.clone(), to: target.clone() })
                } else {
                    i.expr.clone()
                };
                results.push(Interpretation::with_cost(
                    s_expr,
                    i.env.clone(),
                    i.cost + s_cost,
                    i.cost,
                ));
            }
        }
    }

    // conversions into types that pattern-match the target
    for node_id in r.conversions.find_matching(target) {
        let conv_target = r.conversions.node(node_id).ty.clone();
        let mut conv_cost = Cost::zero();
        let mut conv_env = Env::new();
        unify::unify(target, &conv_target, &mut conv_cost, &mut conv_env);

        let incoming: Vec<(Ty, Cost)> = r
            .conversions
            .into_node(node_id)
            .map(|c| (r.conversions.source(c).clone(), c.cost))
            .collect();
        for (from_ty, in_cost) in incoming {
            for (key_ty, decls) in return_leaves(r, name, &from_ty) {
                let s_results =
                    resolve_to_any(r, &decls, args, &conv_env, mode.without_conversions());
                if s_results.is_empty() {
                    continue;
                }
                results.extend(cast_results(
                    s_results,
                    &key_ty,
                    &from_ty,
                    &conv_target,
                    conv_cost + in_cost,
                    mode,
                ));
            }
        }
    }

    results
}

/// Resolves a subexpression against an unbound target variable: resolve
/// with no target, then bind each result type to the variable's class.
fn resolve_to_unbound(
    r: &mut Resolver,
    expr: &Rc<Expr>,
    target: &PolyVar,
    env: &Env,
    mode: ResolverMode,
) -> Vec<Rc<Interpretation>> {
    let plain = ResolverMode::default();
    let subs: Vec<Rc<Interpretation>> = if env.is_empty() {
        if let Some(hit) = r.cache.get(expr, plain.bits()) {
            hit.clone()
        } else {
            let computed = resolve(r, expr, env, plain);
            r.cache.put(expr, plain.bits(), computed.clone());
            computed
        }
    } else {
        resolve(r, expr, env, plain)
    };

    let mut results = Vec::new();
    for i in subs {
        let mut r_env = env.clone();
        if !r_env.merge(&i.env) {
            continue;
        }
        let mut r_cost = i.cost;

        let full_ty = i.type_of().clone();
        let (r_type, was_tuple) = match &full_ty {
            Ty::Tuple(els) => (els[0].clone(), true),
            other => (other.clone(), false),
        };

        match &r_type {
            Ty::Conc(_) | Ty::Named(..) => {
                if !expand::class_binds(&mut r_env, target, &r_type, &mut r_cost) {
                    continue;
                }
            }
            Ty::Poly(p) => {
                let cls = r_env.get_class(target);
                if !r_env.bind_var(cls, p) {
                    continue;
                }
                r_cost.poly += 2;
            }
            // only atomic results can bind an unbound target
            _ => continue,
        }

        let mut r_expr = i.expr.clone();
        if was_tuple && mode.truncate {
            r_expr = Rc::new(TypedExpr::Truncate { arg: r_expr, to: r_type.clone() });
            r_cost.safe += (full_ty.size() - 1) as u32;
        }
        results.push(Interpretation::with_cost(r_expr, r_env, r_cost, i.arg_cost));
    }
    results
}

/// Resolves an expression against a target type under an environment,
/// making the target concrete through the environment first.
pub fn resolve_with_ext_type(
    r: &mut Resolver,
    expr: &Rc<Expr>,
    target: &Ty,
    env: &Env,
    mode: ResolverMode,
) -> Vec<Rc<Interpretation>> {
    let mut r_cost = Cost::zero();
    let mut still_poly = false;
    let target = env.substitute_costed(target, &mut r_cost.poly, &mut still_poly);

    // only an unbound variable survives substitution as the whole target
    if let Ty::Poly(v) = &target {
        return resolve_to_unbound(r, expr, v, env, mode);
    }

    match &**expr {
        Expr::Val(ty) => {
            let mut r_env = env.clone();
            let e = Rc::new(TypedExpr::Val(ty.clone()));
            match expand::convert_to_expr(
                &target,
                &e,
                r.conversions,
                &mut r_env,
                &mut r_cost,
                mode.truncate,
            ) {
                Some(out) => vec![Interpretation::with_cost(out, r_env, r_cost, Cost::zero())],
                None => Vec::new(),
            }
        }
        Expr::Name(name) => {
            let candidates = name_interps(r, name, env);
            expand::convert_to_list(&target, candidates, r.conversions)
        }
        Expr::Call { name, args } => {
            if r.funcs.find(name).is_none() {
                return Vec::new();
            }

            let subs: Vec<Rc<Interpretation>> =
                if let Some(hit) = r.cache.get_typed(expr, mode.bits(), &target) {
                    hit.clone()
                } else {
                    let computed = if still_poly {
                        resolve_to_poly(r, name, args, &target, mode)
                    } else {
                        resolve_to(r, name, args, &target, mode)
                    };
                    r.cache.put_typed(expr, mode.bits(), &target, computed.clone());
                    computed
                };

            if env.is_empty() && r_cost == Cost::zero() {
                return subs;
            }

            let mut out = Vec::with_capacity(subs.len());
            for i in subs {
                let s_ty = i.type_of().clone();
                let mut s_env = env.clone();
                let mut s_cost = if s_ty.is_poly() { i.cost } else { r_cost + i.cost };
                if still_poly && !unify::unify_ext(&target, &s_ty, &mut s_cost, &mut s_env) {
                    continue;
                }
                if !s_env.merge(&i.env) {
                    continue;
                }
                out.push(Interpretation::with_cost(i.expr.clone(), s_env, s_cost, i.arg_cost));
            }
            out
        }
    }
}
