//! The function table: a two-level index over declarations.
//!
//! The outer level keys on name; the inner level keeps every view the
//! two search directions need -- insertion order, by parameter count,
//! and by return type through a `TypeMap` -- plus a separate map of
//! variable declarations for `&name` references.

use std::rc::Rc;

use rustc_hash::FxHashMap;
use weft_ast::decl::{FuncDecl, VarDecl};

use crate::type_map::TypeMap;

/// Declarations sharing one name, indexed every way a search needs.
#[derive(Clone, Debug, Default)]
pub struct FuncIndex {
    all: Vec<Rc<FuncDecl>>,
    by_arity: FxHashMap<usize, Vec<Rc<FuncDecl>>>,
    by_return: TypeMap<Vec<Rc<FuncDecl>>>,
}

impl FuncIndex {
    /// Every declaration with this name, in insertion order.
    pub fn all(&self) -> &[Rc<FuncDecl>] {
        &self.all
    }

    /// Declarations with exactly `n` parameters, in insertion order.
    pub fn with_arity(&self, n: usize) -> &[Rc<FuncDecl>] {
        self.by_arity.get(&n).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The return-type trie over these declarations.
    pub fn by_return(&self) -> &TypeMap<Vec<Rc<FuncDecl>>> {
        &self.by_return
    }

    fn insert(&mut self, decl: Rc<FuncDecl>) {
        self.all.push(decl.clone());
        self.by_arity
            .entry(decl.params().len())
            .or_default()
            .push(decl.clone());
        let ret = decl.returns().clone();
        match self.by_return.find_mut(&ret) {
            Some(list) => list.push(decl),
            None => {
                self.by_return.insert(ret, vec![decl]);
            }
        }
    }
}

/// All declarations known to a resolver run.
#[derive(Clone, Debug, Default)]
pub struct FuncTable {
    funcs: FxHashMap<String, FuncIndex>,
    vars: FxHashMap<String, Vec<Rc<VarDecl>>>,
    n_decls: usize,
}

impl FuncTable {
    pub fn new() -> Self {
        FuncTable::default()
    }

    /// Count of function declarations inserted.
    pub fn len(&self) -> usize {
        self.n_decls
    }

    pub fn is_empty(&self) -> bool {
        self.n_decls == 0
    }

    /// Inserts a function declaration, also registering a variable view
    /// of it (its own function type) for `&name` references.
    pub fn insert(&mut self, decl: FuncDecl) {
        let var = VarDecl::new(decl.name(), decl.tag(), decl.fn_type());
        let decl = Rc::new(decl);
        self.funcs.entry(decl.name().to_owned()).or_default().insert(decl.clone());
        self.vars.entry(decl.name().to_owned()).or_default().push(Rc::new(var));
        self.n_decls += 1;
    }

    pub fn insert_var(&mut self, var: VarDecl) {
        self.vars.entry(var.name().to_owned()).or_default().push(Rc::new(var));
    }

    /// The index of functions with this name.
    pub fn find(&self, name: &str) -> Option<&FuncIndex> {
        self.funcs.get(name)
    }

    /// The variable declarations with this name.
    pub fn find_vars(&self, name: &str) -> &[Rc<VarDecl>] {
        self.vars.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rc<FuncDecl>> {
        self.funcs.values().flat_map(|ix| ix.all.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_ast::ty::Ty;

    fn table() -> FuncTable {
        let mut t = FuncTable::new();
        t.insert(FuncDecl::with_forall("f", "a", vec![Ty::Conc(1)], Ty::Conc(2), None));
        t.insert(FuncDecl::with_forall("f", "b", vec![Ty::Conc(1)], Ty::Conc(3), None));
        t.insert(FuncDecl::with_forall(
            "f",
            "c",
            vec![Ty::Conc(1), Ty::Conc(1)],
            Ty::Conc(2),
            None,
        ));
        t.insert(FuncDecl::new("g", vec![], Ty::Void));
        t
    }

    #[test]
    fn arity_buckets_preserve_insertion_order() {
        let t = table();
        let ix = t.find("f").expect("f is declared");
        let tags: Vec<&str> = ix.with_arity(1).iter().map(|d| d.tag()).collect();
        assert_eq!(tags, vec!["a", "b"]);
        assert_eq!(ix.with_arity(2).len(), 1);
        assert!(ix.with_arity(3).is_empty());
    }

    #[test]
    fn return_index_groups_by_type() {
        let t = table();
        let ix = t.find("f").expect("f is declared");
        let with_2 = ix.by_return().find(&Ty::Conc(2)).expect("2-returning fs");
        assert_eq!(with_2.len(), 2);
        let with_3 = ix.by_return().find(&Ty::Conc(3)).expect("3-returning fs");
        assert_eq!(with_3.len(), 1);
    }

    #[test]
    fn every_function_has_a_variable_view() {
        let t = table();
        let vars = t.find_vars("f");
        assert_eq!(vars.len(), 3);
        assert_eq!(
            vars[0].ty(),
            &Ty::Func(vec![Ty::Conc(1)], Box::new(Ty::Conc(2)))
        );
        assert!(t.find_vars("h").is_empty());
        assert_eq!(t.len(), 4);
    }
}
