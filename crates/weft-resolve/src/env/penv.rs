//! The persistent environment backend.
//!
//! Classes live in a persistent union-find and bounds in a persistent
//! map keyed by class representative, so cloning an environment for a
//! speculative branch shares all structure and rolling back is free.
//! Selected by the `persistent-env` cargo feature; the contract matches
//! the by-value backend.

use std::fmt;
use std::rc::Rc;

use weft_ast::decl::FuncDecl;
use weft_ast::ty::{PolyVar, Ty};

use super::{EnvOps, TypeClass};
use crate::persist::{PMap, PUnionFind};
use crate::texpr::TypedExpr;
use crate::unify;

/// Reference to a class: its representative variable at the time of the
/// lookup. Re-find through a member variable after any binding call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassRef(PolyVar);

/// A persistent environment: type classes plus assertion bindings.
#[derive(Clone, Default)]
pub struct Env {
    uf: PUnionFind,
    /// Bound types, keyed by the class representative current when the
    /// bound was set; stale keys are never roots again.
    bounds: PMap<PolyVar, Ty>,
    assns: PMap<usize, (Rc<FuncDecl>, Rc<TypedExpr>)>,
}

impl Env {
    pub fn new() -> Self {
        Env::default()
    }

    pub fn is_empty(&self) -> bool {
        self.uf.is_empty() && self.assns.is_empty()
    }

    pub fn classes(&self) -> Vec<TypeClass> {
        self.uf
            .classes()
            .into_iter()
            .map(|(root, vars)| TypeClass { vars, bound: self.bounds.get(&root) })
            .collect()
    }

    pub fn find_ref(&self, var: &PolyVar) -> Option<ClassRef> {
        self.uf.root(var).map(ClassRef)
    }

    pub fn get_class(&mut self, var: &PolyVar) -> ClassRef {
        ClassRef(self.uf.find(var))
    }

    /// The referenced class, rebuilt by value.
    pub fn class(&self, r: &ClassRef) -> TypeClass {
        TypeClass { vars: self.uf.class_of(&r.0), bound: self.bound_of(r) }
    }

    pub fn bound_of(&self, r: &ClassRef) -> Option<Ty> {
        let root = self.uf.root(&r.0)?;
        self.bounds.get(&root)
    }

    pub fn insert_var(&mut self, var: &PolyVar) -> bool {
        if self.uf.contains(var) {
            return false;
        }
        self.uf.insert(var);
        true
    }

    pub fn occurs_in(&self, vars: &[PolyVar], ty: &Ty) -> bool {
        match ty {
            Ty::Poly(v) => {
                if vars.contains(v) {
                    return true;
                }
                match self.uf.root(v).and_then(|r| self.bounds.get(&r)) {
                    Some(b) => self.occurs_in(vars, &b),
                    None => false,
                }
            }
            Ty::Conc(_) | Ty::Void => false,
            Ty::Named(_, params) => params.iter().any(|p| self.occurs_in(vars, p)),
            Ty::Tuple(els) => els.iter().any(|e| self.occurs_in(vars, e)),
            Ty::Func(params, ret) => {
                params.iter().any(|p| self.occurs_in(vars, p)) || self.occurs_in(vars, ret)
            }
        }
    }

    pub fn bind_type(&mut self, r: ClassRef, ty: Ty) -> bool {
        let root = self.uf.find(&r.0);
        if self.occurs_in(&self.uf.class_of(&root), &ty) {
            return false;
        }
        self.bounds = self.bounds.set(root, ty);
        true
    }

    pub fn bind_var(&mut self, r: ClassRef, var: &PolyVar) -> bool {
        let root = self.uf.find(&r.0);
        if self.uf.contains(var) {
            let vroot = self.uf.find(var);
            if vroot == root {
                return true;
            }
            self.merge_roots(root, vroot)
        } else {
            if let Some(bound) = self.bounds.get(&root) {
                if self.occurs_in(std::slice::from_ref(var), &bound) {
                    return false;
                }
            }
            self.uf.insert(var);
            let new_root = self.uf.union(&root, var);
            self.rekey_bound(&root, &new_root);
            true
        }
    }

    /// Re-keys a bound after its class representative changed.
    fn rekey_bound(&mut self, old: &PolyVar, new: &PolyVar) {
        if old != new {
            if let Some(b) = self.bounds.get(old) {
                self.bounds = self.bounds.set(new.clone(), b);
            }
        }
    }

    /// Unions two classes by representative, merging their bounds.
    fn merge_roots(&mut self, a: PolyVar, b: PolyVar) -> bool {
        let ba = self.bounds.get(&a);
        let bb = self.bounds.get(&b);
        let new_root = self.uf.union(&a, &b);

        match (ba, bb) {
            (None, None) => true,
            (Some(x), None) => {
                self.bounds = self.bounds.set(new_root, x);
                true
            }
            (None, Some(y)) => {
                self.bounds = self.bounds.set(new_root, y);
                true
            }
            (Some(x), Some(y)) => {
                if x == y {
                    self.bounds = self.bounds.set(new_root, x);
                    return true;
                }
                let mut poly_cost = 0;
                match unify::unify_types(&x, &y, self, &mut poly_cost) {
                    Some(common) => {
                        let root = self.uf.find(&new_root);
                        self.bounds = self.bounds.set(root, common);
                        true
                    }
                    None => false,
                }
            }
        }
    }

    pub fn merge(&mut self, other: &Env) -> bool {
        for (root, members) in other.uf.classes() {
            let rep = match members.first() {
                Some(v) => v.clone(),
                None => continue,
            };
            self.get_class(&rep);
            for v in &members[1..] {
                let r = self.get_class(&rep);
                if !self.bind_var(r, v) {
                    return false;
                }
            }
            if let Some(b) = other.bounds.get(&root) {
                let r = self.get_class(&rep);
                match self.bound_of(&r) {
                    None => {
                        if !self.bind_type(r, b) {
                            return false;
                        }
                    }
                    Some(x) if x == b => {}
                    Some(x) => {
                        let mut poly_cost = 0;
                        let Some(common) = unify::unify_types(&x, &b, self, &mut poly_cost)
                        else {
                            return false;
                        };
                        let root = self.uf.find(&rep);
                        self.bounds = self.bounds.set(root, common);
                    }
                }
            }
        }

        // collect first: inserting while iterating could reroot a shared
        // version tree mid-read
        let mut pending = Vec::new();
        other.assns.for_each(|k, v| pending.push((*k, v.clone())));
        for (k, v) in pending {
            if !self.assns.contains(&k) {
                self.assns = self.assns.set(k, v);
            }
        }
        true
    }

    pub fn find_assertion(&self, decl: &Rc<FuncDecl>) -> Option<Rc<TypedExpr>> {
        self.assns.get(&(Rc::as_ptr(decl) as usize)).map(|(_, e)| e)
    }

    pub fn bind_assertion(&mut self, decl: &Rc<FuncDecl>, expr: Rc<TypedExpr>) {
        let key = Rc::as_ptr(decl) as usize;
        if !self.assns.contains(&key) {
            self.assns = self.assns.set(key, (decl.clone(), expr));
        }
    }

    pub fn replace(&self, ty: &Ty) -> Ty {
        let mut crnt = ty.clone();
        while let Ty::Poly(v) = &crnt {
            match self.uf.root(v).and_then(|r| self.bounds.get(&r)) {
                Some(b) => crnt = b,
                None => break,
            }
        }
        crnt
    }

    pub fn substitute(&self, ty: &Ty) -> Ty {
        let mut f = |v: &PolyVar| -> Option<Ty> {
            let bound = self.uf.root(v).and_then(|r| self.bounds.get(&r))?;
            Some(self.substitute(&bound))
        };
        ty.map_poly(&mut f).unwrap_or_else(|| ty.clone())
    }

    pub fn substitute_costed(&self, ty: &Ty, count: &mut u32, poly: &mut bool) -> Ty {
        let mut f = |v: &PolyVar| -> Option<Ty> {
            match self.uf.root(v).and_then(|r| self.bounds.get(&r)) {
                Some(b) => {
                    *count += 1;
                    Some(self.substitute_costed(&b, count, poly))
                }
                None => {
                    *poly = true;
                    None
                }
            }
        };
        ty.map_poly(&mut f).unwrap_or_else(|| ty.clone())
    }

    pub fn unbound(&self) -> Vec<TypeClass> {
        self.classes().into_iter().filter(|c| c.bound.is_none()).collect()
    }
}

impl EnvOps for Env {
    fn bound_for(&self, v: &PolyVar) -> Option<Ty> {
        self.uf.root(v).and_then(|r| self.bounds.get(&r))
    }

    fn ensure_var(&mut self, v: &PolyVar) {
        self.uf.insert(v);
    }

    fn bind_var_type(&mut self, v: &PolyVar, ty: Ty) -> bool {
        let r = self.get_class(v);
        self.bind_type(r, ty)
    }

    fn unite(&mut self, a: &PolyVar, b: &PolyVar) -> bool {
        let r = self.get_class(a);
        self.bind_var(r, b)
    }
}

impl fmt::Debug for Env {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl fmt::Display for Env {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, c) in self.classes().iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{c}")?;
        }
        let mut assns: Vec<(Rc<FuncDecl>, Rc<TypedExpr>)> = Vec::new();
        self.assns.for_each(|_, v| assns.push(v.clone()));
        for (d, e) in assns {
            write!(f, " | {d} => {e}")?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(name: &str, id: u32) -> PolyVar {
        PolyVar::with_id(name, id)
    }

    #[test]
    fn contract_matches_flat_backend() {
        let mut env = Env::new();
        let t = v("T", 1);
        let u = v("U", 2);

        let r = env.get_class(&t);
        assert!(env.bind_var(r, &u));
        let r = env.find_ref(&u).expect("bound var");
        assert!(env.bind_type(r, Ty::Conc(3)));

        assert_eq!(env.bound_for(&t), Some(Ty::Conc(3)));
        assert_eq!(env.replace(&Ty::Poly(t.clone())), Ty::Conc(3));
        assert!(env.unbound().is_empty());
    }

    #[test]
    fn occurs_check_holds() {
        let mut env = Env::new();
        let t = v("T", 1);
        let r = env.get_class(&t);
        assert!(!env.bind_type(r, Ty::Named("box".into(), vec![Ty::Poly(t.clone())])));
    }

    #[test]
    fn clone_is_a_snapshot() {
        let mut env = Env::new();
        let t = v("T", 1);
        env.get_class(&t);

        let snapshot = env.clone();
        let r = env.get_class(&t);
        assert!(env.bind_type(r, Ty::Conc(5)));

        // the earlier version is unaffected by the later binding
        assert_eq!(env.bound_for(&t), Some(Ty::Conc(5)));
        assert_eq!(snapshot.bound_for(&t), None);
    }

    #[test]
    fn merge_unions_bounds() {
        let t = v("T", 1);

        let mut a = Env::new();
        let r = a.get_class(&t);
        assert!(a.bind_type(r, Ty::Conc(2)));

        let mut b = Env::new();
        let u = v("U", 2);
        let r = b.get_class(&t);
        assert!(b.bind_var(r, &u));

        let mut ab = a.clone();
        assert!(ab.merge(&b));
        assert_eq!(ab.bound_for(&u), Some(Ty::Conc(2)));

        // conflicting bounds fail the merge
        let mut c = Env::new();
        let r = c.get_class(&t);
        assert!(c.bind_type(r, Ty::Conc(9)));
        let mut ac = a.clone();
        assert!(!ac.merge(&c));
    }

    #[test]
    fn merge_with_empty_is_identity() {
        let mut env = Env::new();
        let t = v("T", 1);
        let r = env.get_class(&t);
        assert!(env.bind_type(r, Ty::Conc(1)));

        let before = env.classes().len();
        assert!(env.merge(&Env::new()));
        assert_eq!(env.classes().len(), before);
    }
}
