//! The by-value environment backend.
//!
//! Classes live in a vector with a variable-to-class index kept beside
//! it; copying an environment copies the storage, and merging walks the
//! other environment's classes into this one. This is the default
//! backend.

use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashMap;
use weft_ast::decl::FuncDecl;
use weft_ast::ty::{PolyVar, Ty};

use super::{EnvOps, TypeClass};
use crate::texpr::TypedExpr;
use crate::unify;

/// Reference to a class within one environment. Invalidated by class
/// merges; re-find through a member variable after any binding call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClassRef(usize);

/// A by-value environment: type classes plus assertion bindings.
#[derive(Clone, Debug, Default)]
pub struct Env {
    classes: Vec<TypeClass>,
    bindings: FxHashMap<PolyVar, usize>,
    assns: FxHashMap<usize, (Rc<FuncDecl>, Rc<TypedExpr>)>,
}

impl Env {
    pub fn new() -> Self {
        Env::default()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty() && self.assns.is_empty()
    }

    pub fn classes(&self) -> impl Iterator<Item = &TypeClass> {
        self.classes.iter()
    }

    pub fn assertions(&self) -> impl Iterator<Item = (&Rc<FuncDecl>, &Rc<TypedExpr>)> {
        self.assns.values().map(|(d, e)| (d, e))
    }

    /// The class holding this variable, if any.
    pub fn find_ref(&self, var: &PolyVar) -> Option<ClassRef> {
        self.bindings.get(var).copied().map(ClassRef)
    }

    /// The class holding this variable, inserting a fresh singleton class
    /// if there is none.
    pub fn get_class(&mut self, var: &PolyVar) -> ClassRef {
        if let Some(r) = self.find_ref(var) {
            return r;
        }
        let ind = self.classes.len();
        self.classes.push(TypeClass { vars: vec![var.clone()], bound: None });
        self.bindings.insert(var.clone(), ind);
        ClassRef(ind)
    }

    pub fn class(&self, r: ClassRef) -> &TypeClass {
        &self.classes[r.0]
    }

    pub fn bound_of(&self, r: ClassRef) -> Option<&Ty> {
        self.classes[r.0].bound.as_ref()
    }

    /// Inserts a singleton class for the variable; false if already
    /// present.
    pub fn insert_var(&mut self, var: &PolyVar) -> bool {
        if self.bindings.contains_key(var) {
            return false;
        }
        self.get_class(var);
        true
    }

    /// True iff any of `vars` appears in `ty`, expanded recursively
    /// through this environment's bounds.
    pub fn occurs_in(&self, vars: &[PolyVar], ty: &Ty) -> bool {
        match ty {
            Ty::Poly(v) => {
                if vars.contains(v) {
                    return true;
                }
                match self.find_ref(v).and_then(|r| self.classes[r.0].bound.as_ref()) {
                    Some(b) => self.occurs_in(vars, b),
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

    /// Sets the class's bound; false if the bound would contain one of
    /// the class's own variables.
    pub fn bind_type(&mut self, r: ClassRef, ty: Ty) -> bool {
        if self.occurs_in(&self.classes[r.0].vars, &ty) {
            return false;
        }
        self.classes[r.0].bound = Some(ty);
        true
    }

    /// Unions the variable's class into `r`; false on an incompatible
    /// bound. `r` may be invalidated -- re-find through a member
    /// variable afterwards.
    pub fn bind_var(&mut self, r: ClassRef, var: &PolyVar) -> bool {
        match self.find_ref(var) {
            Some(vr) if vr == r => true,
            Some(vr) => self.merge_classes(r.0, vr.0),
            None => {
                if let Some(bound) = self.classes[r.0].bound.clone() {
                    if self.occurs_in(std::slice::from_ref(var), &bound) {
                        return false;
                    }
                }
                self.classes[r.0].vars.push(var.clone());
                self.bindings.insert(var.clone(), r.0);
                true
            }
        }
    }

    /// Moves class `s` into class `r`, merging bounds.
    fn merge_classes(&mut self, mut r: usize, s: usize) -> bool {
        let TypeClass { vars, bound } = self.classes.swap_remove(s);

        // repair the index for the class moved into slot s
        if s < self.classes.len() {
            let moved: Vec<PolyVar> = self.classes[s].vars.clone();
            for v in moved {
                self.bindings.insert(v, s);
            }
            if r == self.classes.len() {
                r = s;
            }
        }

        for v in &vars {
            self.bindings.insert(v.clone(), r);
        }
        self.classes[r].vars.extend(vars);

        self.merge_bound(r, bound)
    }

    /// Makes `cbound` the bound of class `r`, unifying with any existing
    /// bound; false if the bounds are incompatible.
    fn merge_bound(&mut self, r: usize, cbound: Option<Ty>) -> bool {
        let Some(cbound) = cbound else { return true };
        match self.classes[r].bound.clone() {
            None => self.bind_type(ClassRef(r), cbound),
            Some(b) if b == cbound => true,
            Some(b) => {
                // remember a member so the class survives nested merges
                let rep = self.classes[r].vars[0].clone();
                let mut poly_cost = 0;
                let Some(common) = unify::unify_types(&b, &cbound, self, &mut poly_cost) else {
                    return false;
                };
                match self.find_ref(&rep) {
                    Some(r2) => {
                        self.classes[r2.0].bound = Some(common);
                        true
                    }
                    None => false,
                }
            }
        }
    }

    /// Unions the other environment into this one. Returns false on any
    /// incompatible pair of bounds; partial changes are not rolled back.
    pub fn merge(&mut self, other: &Env) -> bool {
        for class in &other.classes {
            let rep = match class.vars.first() {
                Some(v) => v,
                None => continue,
            };
            self.get_class(rep);
            for v in &class.vars[1..] {
                let Some(r) = self.find_ref(rep) else { return false };
                if !self.bind_var(r, v) {
                    return false;
                }
            }
            if let Some(bound) = &class.bound {
                let Some(r) = self.find_ref(rep) else { return false };
                if !self.merge_bound(r.0, Some(bound.clone())) {
                    return false;
                }
            }
        }

        for (k, (d, e)) in &other.assns {
            self.assns.entry(*k).or_insert_with(|| (d.clone(), e.clone()));
        }
        true
    }

    pub fn find_assertion(&self, decl: &Rc<FuncDecl>) -> Option<Rc<TypedExpr>> {
        self.assns.get(&(Rc::as_ptr(decl) as usize)).map(|(_, e)| e.clone())
    }

    /// Binds an assertion; the declaration should be unbound here.
    pub fn bind_assertion(&mut self, decl: &Rc<FuncDecl>, expr: Rc<TypedExpr>) {
        self.assns
            .entry(Rc::as_ptr(decl) as usize)
            .or_insert_with(|| (decl.clone(), expr));
    }

    /// Replaces a variable with its bound, following chains of bounds.
    pub fn replace(&self, ty: &Ty) -> Ty {
        let mut crnt = ty;
        while let Ty::Poly(v) = crnt {
            match self.find_ref(v).and_then(|r| self.classes[r.0].bound.as_ref()) {
                Some(b) => crnt = b,
                None => break,
            }
        }
        crnt.clone()
    }

    /// Substitutes every bound variable in the type, recursively.
    pub fn substitute(&self, ty: &Ty) -> Ty {
        let mut f = |v: &PolyVar| -> Option<Ty> {
            let bound = self.find_ref(v).and_then(|r| self.classes[r.0].bound.clone())?;
            Some(self.substitute(&bound))
        };
        ty.map_poly(&mut f).unwrap_or_else(|| ty.clone())
    }

    /// Substitution that counts replacements and reports whether any
    /// unbound variable remains.
    pub fn substitute_costed(&self, ty: &Ty, count: &mut u32, poly: &mut bool) -> Ty {
        let mut f = |v: &PolyVar| -> Option<Ty> {
            match self.find_ref(v).and_then(|r| self.classes[r.0].bound.clone()) {
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

    /// The classes with no bound.
    pub fn unbound(&self) -> Vec<TypeClass> {
        self.classes.iter().filter(|c| c.bound.is_none()).cloned().collect()
    }
}

impl EnvOps for Env {
    fn bound_for(&self, v: &PolyVar) -> Option<Ty> {
        self.find_ref(v).and_then(|r| self.classes[r.0].bound.clone())
    }

    fn ensure_var(&mut self, v: &PolyVar) {
        self.get_class(v);
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

impl fmt::Display for Env {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, c) in self.classes.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{c}")?;
        }
        for (d, e) in self.assertions() {
            write!(f, " | {d} => {e}")?;
        }
        write!(f, "}}")
    }
}
