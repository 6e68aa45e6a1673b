//! Forall clauses: the carrier of a declaration's type variables and
//! assertions.
//!
//! Instantiating a forall for a call site rebinds every variable to a
//! fresh instance id drawn from a shared counter, rewriting the assertion
//! declarations consistently (including any nested forall clauses they
//! carry).

use std::fmt;
use std::rc::Rc;

use crate::decl::FuncDecl;
use crate::ty::{PolyVar, Ty};

/// A forall clause owning a set of type variables and the assertion
/// declarations that constrain them.
#[derive(Clone, Debug, Default)]
pub struct Forall {
    vars: Vec<PolyVar>,
    assns: Vec<Rc<FuncDecl>>,
}

impl Forall {
    pub fn new() -> Self {
        Forall::default()
    }

    pub fn variables(&self) -> &[PolyVar] {
        &self.vars
    }

    pub fn assertions(&self) -> &[Rc<FuncDecl>] {
        &self.assns
    }

    /// True iff the clause owns no variables and no assertions.
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty() && self.assns.is_empty()
    }

    /// The variable with the given name, if any.
    pub fn get(&self, name: &str) -> Option<&PolyVar> {
        self.vars.iter().find(|v| v.name == name)
    }

    /// Adds a declaration-form variable with this name if not yet present;
    /// returns the clause's variable either way.
    pub fn add(&mut self, name: &str) -> PolyVar {
        if let Some(v) = self.get(name) {
            return v.clone();
        }
        let v = PolyVar::new(name);
        self.vars.push(v.clone());
        v
    }

    pub fn add_assertion(&mut self, assn: Rc<FuncDecl>) {
        self.assns.push(assn);
    }

    /// Instantiates a declaration's forall for one call site, skipping
    /// empty clauses. Fresh instance ids are drawn from `src`.
    pub fn instantiate(orig: Option<&Forall>, src: &mut u32) -> Option<Forall> {
        match orig {
            Some(f) if !f.is_empty() => Some(f.fresh(src)),
            _ => None,
        }
    }

    /// Rewrites declaration-form variables in a type to this clause's
    /// variables, matching by name.
    pub fn apply(&self, t: &Ty) -> Ty {
        let mut f = |v: &PolyVar| -> Option<Ty> {
            if v.id != 0 {
                return None;
            }
            self.get(&v.name).map(|nv| Ty::Poly(nv.clone()))
        };
        t.map_poly(&mut f).unwrap_or_else(|| t.clone())
    }

    pub fn apply_all(&self, ts: &[Ty]) -> Vec<Ty> {
        ts.iter().map(|t| self.apply(t)).collect()
    }

    /// Copies this clause, rebinding every variable to a fresh instance
    /// id and rewriting assertion declarations to match.
    pub fn fresh(&self, src: &mut u32) -> Forall {
        let mut out = Forall::new();
        out.vars.reserve(self.vars.len());
        for v in &self.vars {
            *src += 1;
            out.vars.push(PolyVar::with_id(&v.name, *src));
        }
        let mut sub = ForallSubst::new(&out);
        out.assns = self
            .assns
            .iter()
            .map(|a| Rc::new(sub.decl(a, src)))
            .collect();
        out
    }
}

impl fmt::Display for Forall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "{{}}");
        }
        write!(f, "{{")?;
        for (i, v) in self.vars.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{v}")?;
        }
        for a in &self.assns {
            write!(f, " | {a}")?;
        }
        write!(f, "}}")
    }
}

/// Rewrites declaration-form type variables to the fresh instances owned
/// by a destination forall; the innermost enclosing clause wins.
struct ForallSubst {
    /// Variable scopes, innermost last.
    ctx: Vec<Vec<PolyVar>>,
}

impl ForallSubst {
    fn new(base: &Forall) -> Self {
        ForallSubst { ctx: vec![base.vars.clone()] }
    }

    fn lookup(&self, name: &str) -> Option<PolyVar> {
        self.ctx
            .iter()
            .rev()
            .find_map(|vars| vars.iter().find(|v| v.name == name))
            .cloned()
    }

    /// Substitutes one type, sharing unchanged subtrees.
    fn ty(&self, t: &Ty) -> Ty {
        let mut lookup = |v: &PolyVar| -> Option<Ty> {
            if v.id != 0 {
                return None;
            }
            self.lookup(&v.name).map(Ty::Poly)
        };
        t.map_poly(&mut lookup).unwrap_or_else(|| t.clone())
    }

    fn tys(&self, ts: &[Ty]) -> Vec<Ty> {
        ts.iter().map(|t| self.ty(t)).collect()
    }

    /// Substitutes an assertion declaration, drawing new ids from `src`
    /// for any nested forall clause it owns.
    fn decl(&mut self, d: &FuncDecl, src: &mut u32) -> FuncDecl {
        match d.forall() {
            None => FuncDecl::with_forall(
                d.name(),
                d.tag(),
                self.tys(d.params()),
                self.ty(d.returns()),
                None,
            ),
            Some(df) => {
                let mut inner_vars = Vec::with_capacity(df.vars.len());
                for v in &df.vars {
                    *src += 1;
                    inner_vars.push(PolyVar::with_id(&v.name, *src));
                }
                self.ctx.push(inner_vars);
                let params = self.tys(d.params());
                let returns = self.ty(d.returns());
                let assns: Vec<Rc<FuncDecl>> = df
                    .assns
                    .iter()
                    .map(|a| Rc::new(self.decl(a, src)))
                    .collect();
                let vars = self.ctx.pop().unwrap_or_default();
                let forall = Forall { vars, assns };
                FuncDecl::with_forall(d.name(), d.tag(), params, returns, Some(forall))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_rebinds_variables() {
        let mut f = Forall::new();
        let t = f.add("T");
        assert_eq!(t.id, 0);

        let mut src = 0;
        let g = f.fresh(&mut src);
        assert_eq!(g.variables().len(), 1);
        assert_eq!(g.variables()[0].name, "T");
        assert_eq!(g.variables()[0].id, 1);
        assert_eq!(src, 1);

        // a second instantiation gets distinct ids
        let h = f.fresh(&mut src);
        assert_ne!(g.variables()[0], h.variables()[0]);
    }

    #[test]
    fn fresh_rewrites_assertion_types() {
        let mut f = Forall::new();
        f.add("T");
        f.add_assertion(Rc::new(FuncDecl::new(
            "eq",
            vec![Ty::poly("T"), Ty::poly("T")],
            Ty::Conc(1),
        )));

        let mut src = 10;
        let g = f.fresh(&mut src);
        let assn = &g.assertions()[0];
        let expected = Ty::Poly(g.variables()[0].clone());
        assert_eq!(assn.params(), &[expected.clone(), expected]);
        assert_eq!(assn.returns(), &Ty::Conc(1));
    }

    #[test]
    fn instantiate_skips_empty() {
        let mut src = 0;
        assert!(Forall::instantiate(None, &mut src).is_none());
        assert!(Forall::instantiate(Some(&Forall::new()), &mut src).is_none());
    }
}
