//! The lexicographic cost of an interpretation.
//!
//! Five unsigned fields compared in order: unsafe conversions, poly
//! bindings, type-variable count, specialization count (inverted -- more
//! specialized is cheaper), and safe conversions.

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};

use weft_ast::decl::FuncDecl;
use weft_ast::ty::Ty;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Cost {
    pub unsafe_: u32,
    pub poly: u32,
    pub vars: u32,
    pub spec: u32,
    pub safe: u32,
}

impl Cost {
    pub const fn new(unsafe_: u32, poly: u32, vars: u32, spec: u32, safe: u32) -> Cost {
        Cost { unsafe_, poly, vars, spec, safe }
    }

    pub const fn zero() -> Cost {
        Cost::new(0, 0, 0, 0, 0)
    }

    /// The greatest cost in the ordering (note `spec` inverted).
    pub const fn max() -> Cost {
        Cost::new(u32::MAX, u32::MAX, u32::MAX, 0, u32::MAX)
    }

    /// Cost of converting across an id difference: unsafe when narrowing
    /// (negative), safe when widening.
    pub const fn from_diff(diff: i32) -> Cost {
        if diff < 0 {
            Cost::from_unsafe(diff.unsigned_abs())
        } else {
            Cost::from_safe(diff as u32)
        }
    }

    pub const fn from_unsafe(unsafe_: u32) -> Cost {
        Cost::new(unsafe_, 0, 0, 0, 0)
    }

    pub const fn from_poly(poly: u32) -> Cost {
        Cost::new(0, poly, 0, 0, 0)
    }

    pub const fn from_vars(vars: u32) -> Cost {
        Cost::new(0, 0, vars, 0, 0)
    }

    pub const fn from_spec(spec: u32) -> Cost {
        Cost::new(0, 0, 0, spec, 0)
    }

    pub const fn from_safe(safe: u32) -> Cost {
        Cost::new(0, 0, 0, 0, safe)
    }
}

impl Ord for Cost {
    fn cmp(&self, other: &Self) -> Ordering {
        self.unsafe_
            .cmp(&other.unsafe_)
            .then_with(|| self.poly.cmp(&other.poly))
            .then_with(|| self.vars.cmp(&other.vars))
            // more specializations make a declaration cheaper
            .then_with(|| other.spec.cmp(&self.spec))
            .then_with(|| self.safe.cmp(&other.safe))
    }
}

impl PartialOrd for Cost {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Add for Cost {
    type Output = Cost;

    fn add(self, rhs: Cost) -> Cost {
        Cost::new(
            self.unsafe_ + rhs.unsafe_,
            self.poly + rhs.poly,
            self.vars + rhs.vars,
            self.spec + rhs.spec,
            self.safe + rhs.safe,
        )
    }
}

impl AddAssign for Cost {
    fn add_assign(&mut self, rhs: Cost) {
        *self = *self + rhs;
    }
}

impl Sub for Cost {
    type Output = Cost;

    fn sub(self, rhs: Cost) -> Cost {
        Cost::new(
            self.unsafe_ - rhs.unsafe_,
            self.poly - rhs.poly,
            self.vars - rhs.vars,
            self.spec - rhs.spec,
            self.safe - rhs.safe,
        )
    }
}

impl SubAssign for Cost {
    fn sub_assign(&mut self, rhs: Cost) {
        *self = *self - rhs;
    }
}

impl fmt::Display for Cost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{},{},", self.unsafe_, self.poly, self.vars)?;
        if self.spec > 0 {
            write!(f, "-")?;
        }
        write!(f, "{},{})", self.spec, self.safe)
    }
}

/// The cost a declaration's polymorphism contributes to every call of it:
/// one `vars` unit per type variable, one `spec` unit per assertion, plus
/// the specialization depth of each parameter and return component.
pub fn poly_cost(decl: &FuncDecl) -> Cost {
    let Some(forall) = decl.forall() else {
        return Cost::zero();
    };

    let mut k = Cost::zero();
    k.vars = forall.variables().len() as u32;
    k.spec = forall.assertions().len() as u32;

    for p in decl.params() {
        k.spec += spec_count(p).unwrap_or(0);
    }
    for r in decl.returns().components() {
        k.spec += spec_count(r).unwrap_or(0);
    }
    k
}

/// Specialization depth of a type: 0 at a bare type variable, one more
/// for each enclosing constructor, `None` for fully concrete types.
fn spec_count(ty: &Ty) -> Option<u32> {
    fn deepest(tys: &[Ty]) -> Option<u32> {
        tys.iter().filter_map(spec_count).max().map(|c| c + 1)
    }

    match ty {
        Ty::Poly(_) => Some(0),
        Ty::Conc(_) | Ty::Void => None,
        Ty::Named(_, params) => deepest(params),
        Ty::Tuple(els) => deepest(els),
        Ty::Func(params, ret) => {
            let from_params = deepest(params);
            let from_ret = spec_count(ret).map(|c| c + 1);
            from_params.max(from_ret)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_ast::forall::Forall;

    #[test]
    fn compare_is_lexicographic() {
        assert!(Cost::from_unsafe(1) > Cost::from_poly(100));
        assert!(Cost::from_poly(1) > Cost::from_vars(100));
        assert!(Cost::from_vars(1) > Cost::from_safe(100));
        assert!(Cost::zero() < Cost::from_safe(1));
    }

    #[test]
    fn spec_orders_in_reverse() {
        // a more specialized declaration (higher spec) is cheaper
        assert!(Cost::from_spec(2) < Cost::from_spec(1));
        assert!(Cost::from_spec(1) < Cost::zero());
        assert!(Cost::max() > Cost::from_unsafe(u32::MAX - 1));
    }

    #[test]
    fn equality_agrees_with_compare() {
        let a = Cost::new(0, 1, 2, 3, 4);
        let b = Cost::new(0, 1, 2, 3, 4);
        assert_eq!(a.cmp(&b), Ordering::Equal);
        assert_eq!(a, b);
    }

    #[test]
    fn arithmetic_is_componentwise() {
        let a = Cost::new(1, 2, 3, 4, 5);
        let b = Cost::new(5, 4, 3, 2, 1);
        assert_eq!(a + b, Cost::new(6, 6, 6, 6, 6));
        assert_eq!((a + b) - b, a);
        assert_eq!(a + b, b + a);
    }

    #[test]
    fn from_diff_signs() {
        assert_eq!(Cost::from_diff(-3), Cost::from_unsafe(3));
        assert_eq!(Cost::from_diff(2), Cost::from_safe(2));
        assert_eq!(Cost::from_diff(0), Cost::zero());
    }

    #[test]
    fn display_negates_spec() {
        assert_eq!(Cost::new(0, 1, 2, 3, 4).to_string(), "(0,1,2,-3,4)");
        assert_eq!(Cost::zero().to_string(), "(0,0,0,0,0)");
    }

    #[test]
    fn poly_cost_counts_vars_assertions_and_spec() {
        // monomorphic declarations cost nothing
        let mono = FuncDecl::new("f", vec![Ty::Conc(1)], Ty::Conc(2));
        assert_eq!(poly_cost(&mono), Cost::zero());

        // T g #box<T> | T f T  ->  1 var, 1 assertion, spec 0 (ret) + 1 (param)
        let mut forall = Forall::new();
        let t = forall.add("T");
        forall.add_assertion(std::rc::Rc::new(FuncDecl::new(
            "f",
            vec![Ty::Poly(t.clone())],
            Ty::Poly(t.clone()),
        )));
        let g = FuncDecl::with_forall(
            "g",
            "",
            vec![Ty::Named("box".into(), vec![Ty::Poly(t.clone())])],
            Ty::Poly(t),
            Some(forall),
        );
        let k = poly_cost(&g);
        assert_eq!(k.vars, 1);
        assert_eq!(k.spec, 1 + 1 + 0);
        assert_eq!(k.poly, 0);
    }
}
