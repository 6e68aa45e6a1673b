//! Structural unification of types under an environment.
//!
//! `unify_types` returns the most specific common type of its arguments
//! or `None`, binding type variables in the environment as it goes and
//! counting each binding into the polymorphism cost. The `unify` wrapper
//! runs against a scratch copy of the environment and commits only on
//! success, so a failed unification never leaves partial bindings
//! behind.

use std::rc::Rc;

use weft_ast::ty::{PolyVar, Ty};

use crate::cost::Cost;
use crate::env::EnvOps;
use crate::interpretation::Interpretation;

/// Unifies a parameter type against an argument type, committing the
/// environment and poly-cost updates only on success.
pub fn unify<E: EnvOps + Clone>(param: &Ty, arg: &Ty, cost: &mut Cost, env: &mut E) -> bool {
    let mut scratch = env.clone();
    let mut poly = cost.poly;
    if unify_types(param, arg, &mut scratch, &mut poly).is_some() {
        *env = scratch;
        cost.poly = poly;
        true
    } else {
        false
    }
}

/// Core unification; dispatches on the kinds of both sides.
pub fn unify_types<E: EnvOps>(a: &Ty, b: &Ty, env: &mut E, poly_cost: &mut u32) -> Option<Ty> {
    match (a, b) {
        (Ty::Conc(x), Ty::Conc(y)) => (x == y).then(|| a.clone()),

        (Ty::Named(n1, p1), Ty::Named(n2, p2)) => {
            if n1 != n2 || p1.len() != p2.len() {
                return None;
            }
            let mut params = Vec::with_capacity(p1.len());
            for (x, y) in p1.iter().zip(p2) {
                params.push(unify_types(x, y, env, poly_cost)?);
            }
            Some(Ty::Named(n1.clone(), params))
        }

        (Ty::Tuple(t1), Ty::Tuple(t2)) => {
            if t1.len() != t2.len() {
                return None;
            }
            let mut els = Vec::with_capacity(t1.len());
            for (x, y) in t1.iter().zip(t2) {
                els.push(unify_types(x, y, env, poly_cost)?);
            }
            Some(Ty::Tuple(els))
        }

        (Ty::Func(p1, r1), Ty::Func(p2, r2)) => {
            if p1.len() != p2.len() {
                return None;
            }
            let ret = unify_types(r1, r2, env, poly_cost)?;
            let mut params = Vec::with_capacity(p1.len());
            for (x, y) in p1.iter().zip(p2) {
                params.push(unify_types(x, y, env, poly_cost)?);
            }
            Some(Ty::Func(params, Box::new(ret)))
        }

        (Ty::Void, Ty::Void) => Some(Ty::Void),

        (Ty::Poly(p), Ty::Poly(q)) => {
            if !env.unite(p, q) {
                return None;
            }
            // one binding on each side
            *poly_cost += 2;
            Some(env.bound_for(p).unwrap_or_else(|| Ty::Poly(p.clone())))
        }

        // only atomic concrete types bind with a variable
        (t @ (Ty::Conc(_) | Ty::Named(..)), Ty::Poly(q)) => bind_common(t, q, env, poly_cost),
        (Ty::Poly(p), t @ (Ty::Conc(_) | Ty::Named(..))) => bind_common(t, p, env, poly_cost),

        _ => None,
    }
}

/// Binds variable `v` against concrete type `t`, unifying with any
/// existing bound first.
fn bind_common<E: EnvOps>(t: &Ty, v: &PolyVar, env: &mut E, poly_cost: &mut u32) -> Option<Ty> {
    env.ensure_var(v);
    let common = match env.bound_for(v) {
        Some(bound) => unify_types(t, &bound, env, poly_cost)?,
        None => t.clone(),
    };
    *poly_cost += 1;
    env.bind_var_type(v, common.clone()).then_some(common)
}

/// Unifies a bound against the first component of a possibly-tuple
/// result type.
pub fn unify_ext<E: EnvOps + Clone>(bound: &Ty, rty: &Ty, cost: &mut Cost, env: &mut E) -> bool {
    match rty {
        Ty::Tuple(els) => unify(bound, &els[0], cost, env),
        _ => unify(bound, rty, cost, env),
    }
}

/// Checks a flattened parameter list against a list of argument
/// interpretations, merging each argument's environment in turn. The
/// caller guarantees the lists have equal length after flattening.
pub fn unify_list(
    params: &[Ty],
    args: &[Rc<Interpretation>],
    cost: &mut Cost,
    env: &mut crate::env::Env,
) -> bool {
    let mut i = 0;
    for arg in args {
        if !env.merge(&arg.env) {
            return false;
        }
        for component in arg.type_of().components() {
            if i >= params.len() || !unify(&params[i], component, cost, env) {
                return false;
            }
            i += 1;
        }
    }
    i == params.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::Env;

    fn v(name: &str, id: u32) -> PolyVar {
        PolyVar::with_id(name, id)
    }

    #[test]
    fn concrete_unification_is_identity() {
        let mut env = Env::new();
        let mut cost = Cost::zero();
        assert!(unify(&Ty::Conc(1), &Ty::Conc(1), &mut cost, &mut env));
        assert_eq!(cost, Cost::zero());
        assert!(env.is_empty());

        assert!(!unify(&Ty::Conc(1), &Ty::Conc(2), &mut cost, &mut env));
    }

    #[test]
    fn variable_binds_to_concrete() {
        let mut env = Env::new();
        let mut cost = Cost::zero();
        let t = v("T", 1);
        assert!(unify(&Ty::Poly(t.clone()), &Ty::Conc(2), &mut cost, &mut env));
        assert_eq!(cost.poly, 1);
        assert_eq!(env.bound_for(&t), Some(Ty::Conc(2)));
    }

    #[test]
    fn bound_variable_rejects_mismatch() {
        let mut env = Env::new();
        let mut cost = Cost::zero();
        let t = v("T", 1);
        assert!(unify(&Ty::Poly(t.clone()), &Ty::Conc(1), &mut cost, &mut env));
        // second unification against a different type fails and leaves
        // the first binding intact
        assert!(!unify(&Ty::Poly(t.clone()), &Ty::Conc(2), &mut cost, &mut env));
        assert_eq!(env.bound_for(&t), Some(Ty::Conc(1)));
    }

    #[test]
    fn variables_unite() {
        let mut env = Env::new();
        let mut cost = Cost::zero();
        let t = v("T", 1);
        let u = v("U", 2);
        assert!(unify(&Ty::Poly(t.clone()), &Ty::Poly(u.clone()), &mut cost, &mut env));
        assert_eq!(cost.poly, 2);

        // binding one now binds the other
        assert!(unify(&Ty::Poly(t.clone()), &Ty::Conc(7), &mut cost, &mut env));
        assert_eq!(env.bound_for(&u), Some(Ty::Conc(7)));
    }

    #[test]
    fn generic_named_types_recurse() {
        let mut env = Env::new();
        let mut cost = Cost::zero();
        let t = v("T", 1);
        let param = Ty::Named("box".into(), vec![Ty::Poly(t.clone())]);
        let arg = Ty::Named("box".into(), vec![Ty::Conc(3)]);
        assert!(unify(&param, &arg, &mut cost, &mut env));
        assert_eq!(env.bound_for(&t), Some(Ty::Conc(3)));

        let other = Ty::Named("sack".into(), vec![Ty::Conc(3)]);
        assert!(!unify(&param, &other, &mut cost, &mut env));
    }

    #[test]
    fn unify_self_is_free_for_concrete_types() {
        let t = Ty::Func(
            vec![Ty::Conc(1), Ty::Named("box".into(), vec![Ty::Conc(2)])],
            Box::new(Ty::Tuple(vec![Ty::Conc(1), Ty::Conc(2)])),
        );
        let mut env = Env::new();
        let mut cost = Cost::zero();
        let mut poly = 0;
        assert_eq!(unify_types(&t, &t, &mut env, &mut poly), Some(t.clone()));
        assert_eq!(poly, 0);
        assert!(unify(&t, &t, &mut cost, &mut env));
        assert_eq!(cost, Cost::zero());
    }

    #[test]
    fn variables_do_not_bind_structured_types() {
        let mut env = Env::new();
        let mut cost = Cost::zero();
        let t = v("T", 1);
        let f = Ty::Func(vec![Ty::Conc(1)], Box::new(Ty::Conc(2)));
        assert!(!unify(&Ty::Poly(t.clone()), &f, &mut cost, &mut env));
        assert!(!unify(&Ty::Poly(t), &Ty::Void, &mut cost, &mut env));
    }

    #[test]
    fn occurs_check_fails_recursive_binding() {
        let mut env = Env::new();
        let mut cost = Cost::zero();
        let t = v("T", 1);
        let recursive = Ty::Named("box".into(), vec![Ty::Poly(t.clone())]);
        assert!(!unify(&Ty::Poly(t), &recursive, &mut cost, &mut env));
    }
}
