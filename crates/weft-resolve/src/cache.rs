//! Memoization of subexpression resolutions.
//!
//! Keys combine the expression's identity, the resolution mode, and (for
//! targeted lookups) the target type. Entries hold results computed
//! under the empty environment; callers merge their own environment into
//! the cached interpretations afterwards, so lookups under a non-empty
//! environment simply bypass the cache.

use std::rc::Rc;

use rustc_hash::FxHashMap;
use weft_ast::expr::Expr;
use weft_ast::ty::Ty;

use crate::interpretation::Interpretation;
use crate::type_map::TypeMap;

/// Identity of a shared input expression.
pub fn expr_id(e: &Rc<Expr>) -> usize {
    Rc::as_ptr(e) as usize
}

type Key = (usize, u8);

/// Cache of interpretation lists per (expression, mode) and target type.
#[derive(Default)]
pub struct ArgCache {
    untargeted: FxHashMap<Key, Vec<Rc<Interpretation>>>,
    targeted: FxHashMap<Key, TypeMap<Vec<Rc<Interpretation>>>>,
}

impl ArgCache {
    pub fn new() -> Self {
        ArgCache::default()
    }

    pub fn clear(&mut self) {
        self.untargeted.clear();
        self.targeted.clear();
    }

    pub fn get(&self, expr: &Rc<Expr>, mode: u8) -> Option<&Vec<Rc<Interpretation>>> {
        self.untargeted.get(&(expr_id(expr), mode))
    }

    pub fn put(&mut self, expr: &Rc<Expr>, mode: u8, results: Vec<Rc<Interpretation>>) {
        self.untargeted.insert((expr_id(expr), mode), results);
    }

    pub fn get_typed(
        &self,
        expr: &Rc<Expr>,
        mode: u8,
        target: &Ty,
    ) -> Option<&Vec<Rc<Interpretation>>> {
        self.targeted.get(&(expr_id(expr), mode))?.find(target)
    }

    pub fn put_typed(
        &mut self,
        expr: &Rc<Expr>,
        mode: u8,
        target: &Ty,
        results: Vec<Rc<Interpretation>>,
    ) {
        let map = self.targeted.entry((expr_id(expr), mode)).or_default();
        if !map.insert(target.clone(), results.clone()) {
            if let Some(slot) = map.find_mut(target) {
                *slot = results;
            }
        }
    }
}
