//! Conversion expansion: growing an interpretation list with every
//! conversion of each result, keeping only the best interpretation per
//! output type, and the targeted variant that converts a single
//! expression to a required type.

use std::cmp::Ordering;
use std::rc::Rc;

use weft_ast::ty::{PolyVar, Ty};

use crate::combos;
use crate::conversion::ConversionGraph;
use crate::cost::Cost;
use crate::env::{Env, EnvOps};
use crate::interpretation::Interpretation;
use crate::texpr::TypedExpr;
use crate::type_map::TypeMap;
use crate::unify;

/// Records `i` as the interpretation for `ty` unless a cheaper one is
/// already there; equal-cost entries merge into an ambiguous node.
pub fn set_or_update(
    expanded: &mut TypeMap<Rc<Interpretation>>,
    ty: &Ty,
    i: Rc<Interpretation>,
) {
    match expanded.find_mut(ty) {
        None => {
            expanded.insert(ty.clone(), i);
        }
        Some(existing) => match Interpretation::compare(existing, &i) {
            Ordering::Greater => *existing = i,
            Ordering::Equal => *existing = Interpretation::merge_ambiguous(existing, &i),
            Ordering::Less => {}
        },
    }
}

/// Replaces `results` with its conversion-expanded form: for every
/// distinct output type, the single best interpretation reachable by
/// zero or more conversions from some result.
pub fn expand_conversions(results: &mut Vec<Rc<Interpretation>>, conv: &ConversionGraph) {
    let mut expanded: TypeMap<Rc<Interpretation>> = TypeMap::new();

    for i in results.iter() {
        let ty = i.type_of().clone();
        set_or_update(&mut expanded, &ty, i.clone());

        match &ty {
            Ty::Conc(_) | Ty::Named(..) => {
                for c in conv.find_from(&ty) {
                    let to = conv.target(c);
                    let cast =
                        Rc::new(TypedExpr::Cast { arg: i.expr.clone(), to: to.clone() });
                    set_or_update(
                        &mut expanded,
                        to,
                        Interpretation::with_cost(cast, i.env.clone(), i.cost + c.cost, i.arg_cost),
                    );
                }
            }
            Ty::Tuple(els) => {
                // per element: keep-as-is plus each outgoing conversion
                let queues: Vec<Vec<Option<usize>>> = els
                    .iter()
                    .map(|el| {
                        let mut q: Vec<Option<usize>> = vec![None];
                        if matches!(el, Ty::Conc(_) | Ty::Named(..)) {
                            q.extend(
                                conv.find_from(el)
                                    .enumerate()
                                    .map(|(k, _)| Some(k)),
                            );
                        }
                        q
                    })
                    .collect();

                combos::for_each_combo(&queues, |inds| {
                    if inds.iter().all(|&j| j == 0) {
                        return; // no conversion anywhere
                    }
                    let mut out_els = Vec::with_capacity(els.len());
                    let mut to_cost = i.cost;
                    for (j, &ind) in inds.iter().enumerate() {
                        let elem =
                            Rc::new(TypedExpr::TupleElem { of: i.expr.clone(), index: j });
                        match queues[j][ind] {
                            None => out_els.push(elem),
                            Some(k) => {
                                let c = conv
                                    .find_from(&els[j])
                                    .nth(k)
                                    .unwrap_or_else(|| unreachable!("queue index in range"));
                                to_cost += c.cost;
                                out_els.push(Rc::new(TypedExpr::Cast {
                                    arg: elem,
                                    to: conv.target(c).clone(),
                                }));
                            }
                        }
                    }
                    let e = TypedExpr::tuple(out_els);
                    let e_ty = e.ty().clone();
                    set_or_update(
                        &mut expanded,
                        &e_ty,
                        Interpretation::with_cost(Rc::new(e), i.env.clone(), to_cost, i.arg_cost),
                    );
                });
            }
            _ => {}
        }
    }

    *results = expanded.iter().map(|(_, v)| v.clone()).collect();
}

/// Binds the variable's class to a concrete type, unifying with any
/// existing bound; counts one poly binding on success.
pub fn class_binds(env: &mut Env, var: &PolyVar, conc: &Ty, cost: &mut Cost) -> bool {
    env.ensure_var(var);
    let ok = match env.bound_for(var) {
        Some(bound) => {
            let mut scratch = env.clone();
            let mut poly = cost.poly;
            match unify::unify_types(&bound, conc, &mut scratch, &mut poly) {
                Some(_) => {
                    *env = scratch;
                    cost.poly = poly;
                    true
                }
                None => false,
            }
        }
        None => env.bind_var_type(var, conc.clone()),
    };
    if ok {
        cost.poly += 1;
    }
    ok
}

/// Converts `expr` to `target`, updating cost and environment; `None` if
/// no conversion applies (env and cost may still have advanced).
pub fn convert_to_expr(
    target: &Ty,
    expr: &Rc<TypedExpr>,
    conv: &ConversionGraph,
    env: &mut Env,
    cost: &mut Cost,
    truncate: bool,
) -> Option<Rc<TypedExpr>> {
    let etype = expr.ty().clone();

    match (&etype, target) {
        (Ty::Conc(_) | Ty::Named(..), Ty::Conc(_) | Ty::Named(..)) => {
            if unify::unify(&etype, target, cost, env) {
                return Some(expr.clone());
            }
            let c = conv.find_between(&etype, target)?;
            *cost += c.cost;
            Some(Rc::new(TypedExpr::Cast { arg: expr.clone(), to: target.clone() }))
        }
        (Ty::Conc(_) | Ty::Named(..), Ty::Poly(v)) => {
            class_binds(env, v, &etype, cost).then(|| expr.clone())
        }
        (Ty::Conc(_) | Ty::Named(..), Ty::Void) => Some(truncate_or_keep(expr, cost, truncate)),
        (Ty::Conc(_) | Ty::Named(..), _) => None,

        (Ty::Poly(v), Ty::Conc(_) | Ty::Named(..) | Ty::Func(..)) => {
            class_binds(env, v, target, cost).then(|| expr.clone())
        }
        (Ty::Poly(v), Ty::Poly(u)) => {
            if env.unite(v, u) {
                cost.poly += 1;
                Some(expr.clone())
            } else {
                None
            }
        }
        (Ty::Poly(_), _) => None,

        (Ty::Void, Ty::Void) => Some(expr.clone()),
        (Ty::Void, _) => None,

        (Ty::Tuple(els), _) => {
            convert_tuple(target, expr, els, conv, env, cost, truncate)
        }

        (Ty::Func(..), Ty::Func(..)) => {
            unify::unify(&etype, target, cost, env).then(|| expr.clone())
        }
        (Ty::Func(..), Ty::Poly(v)) => {
            class_binds(env, v, &etype, cost).then(|| expr.clone())
        }
        (Ty::Func(..), Ty::Void) => Some(truncate_or_keep(expr, cost, truncate)),
        (Ty::Func(..), _) => None,
    }
}

fn truncate_or_keep(expr: &Rc<TypedExpr>, cost: &mut Cost, truncate: bool) -> Rc<TypedExpr> {
    if truncate {
        cost.safe += 1;
        Rc::new(TypedExpr::Truncate { arg: expr.clone(), to: Ty::Void })
    } else {
        expr.clone()
    }
}

fn convert_tuple(
    target: &Ty,
    expr: &Rc<TypedExpr>,
    els: &[Ty],
    conv: &ConversionGraph,
    env: &mut Env,
    cost: &mut Cost,
    truncate: bool,
) -> Option<Rc<TypedExpr>> {
    let en = els.len();
    let tn = target.size();
    if tn > en {
        return None;
    }

    match tn {
        0 => {
            if truncate {
                cost.safe += en as u32;
                Some(Rc::new(TypedExpr::Truncate { arg: expr.clone(), to: Ty::Void }))
            } else {
                Some(expr.clone())
            }
        }
        1 => {
            if truncate {
                let first = Rc::new(TypedExpr::truncate(expr.clone(), 1));
                let el = convert_to_expr(target, &first, conv, env, cost, truncate)?;
                cost.safe += (en - 1) as u32;
                Some(el)
            } else {
                let el0: Rc<TypedExpr> =
                    Rc::new(TypedExpr::TupleElem { of: expr.clone(), index: 0 });
                let el = convert_to_expr(target, &el0, conv, env, cost, truncate)?;
                if Rc::ptr_eq(&el, &el0) {
                    return Some(expr.clone());
                }
                let mut out = Vec::with_capacity(en);
                out.push(el);
                for j in 1..en {
                    out.push(Rc::new(TypedExpr::TupleElem { of: expr.clone(), index: j }));
                }
                Some(Rc::new(TypedExpr::tuple(out)))
            }
        }
        _ => {
            let Ty::Tuple(tels) = target else { return None };
            let mut out = Vec::with_capacity(if truncate { tn } else { en });
            let mut converted = false;
            for (j, t) in tels.iter().enumerate() {
                let elj: Rc<TypedExpr> =
                    Rc::new(TypedExpr::TupleElem { of: expr.clone(), index: j });
                let el = convert_to_expr(t, &elj, conv, env, cost, true)?;
                converted |= !Rc::ptr_eq(&el, &elj);
                out.push(el);
            }

            if en == tn {
                if converted {
                    Some(Rc::new(TypedExpr::tuple(out)))
                } else {
                    Some(expr.clone())
                }
            } else if truncate {
                cost.safe += (en - tn) as u32;
                if converted {
                    Some(Rc::new(TypedExpr::tuple(out)))
                } else {
                    Some(Rc::new(TypedExpr::truncate(expr.clone(), tn)))
                }
            } else {
                if !converted {
                    return Some(expr.clone());
                }
                for j in tn..en {
                    out.push(Rc::new(TypedExpr::TupleElem { of: expr.clone(), index: j }));
                }
                Some(Rc::new(TypedExpr::tuple(out)))
            }
        }
    }
}

/// Keeps, per reachable type, the best conversion of each result to the
/// target type.
pub fn convert_to_list(
    target: &Ty,
    results: Vec<Rc<Interpretation>>,
    conv: &ConversionGraph,
) -> Vec<Rc<Interpretation>> {
    let mut best: TypeMap<Rc<Interpretation>> = TypeMap::new();

    for i in results {
        if i.type_of() == target {
            let ty = i.type_of().clone();
            set_or_update(&mut best, &ty, i.clone());
            continue;
        }
        let mut cost = i.cost;
        let mut env = i.env.clone();
        if let Some(new_expr) = convert_to_expr(target, &i.expr, conv, &mut env, &mut cost, true) {
            let new_ty = new_expr.ty().clone();
            set_or_update(
                &mut best,
                &new_ty,
                Interpretation::with_cost(new_expr, env, cost, i.arg_cost),
            );
        }
    }

    best.iter().map(|(_, v)| v.clone()).collect()
}
