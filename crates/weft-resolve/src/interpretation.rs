//! A typed interpretation of an input expression: the rewritten
//! expression, the environment its type variables were bound in, and its
//! cost. Interpretations order by (cost, argument cost).

use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use weft_ast::ty::Ty;

use crate::cost::Cost;
use crate::env::Env;
use crate::texpr::{Style, TypedExpr};

#[derive(Clone, Debug)]
pub struct Interpretation {
    pub expr: Rc<TypedExpr>,
    pub env: Env,
    pub cost: Cost,
    pub arg_cost: Cost,
}

impl Interpretation {
    /// A zero-cost interpretation.
    pub fn new(expr: Rc<TypedExpr>, env: Env) -> Rc<Interpretation> {
        Interpretation::with_cost(expr, env, Cost::zero(), Cost::zero())
    }

    pub fn with_cost(
        expr: Rc<TypedExpr>,
        env: Env,
        cost: Cost,
        arg_cost: Cost,
    ) -> Rc<Interpretation> {
        Rc::new(Interpretation { expr, env, cost, arg_cost })
    }

    /// The resolved type of the interpretation.
    pub fn type_of(&self) -> &Ty {
        self.expr.ty()
    }

    pub fn is_ambiguous(&self) -> bool {
        self.expr.is_ambiguous()
    }

    /// Orders two interpretations by cost, then argument cost.
    pub fn compare(a: &Interpretation, b: &Interpretation) -> Ordering {
        a.cost.cmp(&b.cost).then_with(|| a.arg_cost.cmp(&b.arg_cost))
    }

    /// Merges two equal-cost interpretations of the same type into one
    /// ambiguous interpretation; alternative environments live in the
    /// alternatives, not the merged node.
    pub fn merge_ambiguous(i: &Rc<Interpretation>, j: &Rc<Interpretation>) -> Rc<Interpretation> {
        let mut alts = Vec::new();
        let source = match &*i.expr {
            TypedExpr::Ambiguous { source, alts: ia, .. } => {
                alts.extend(ia.iter().cloned());
                source.clone()
            }
            _ => {
                alts.push(i.clone());
                i.expr.clone()
            }
        };
        match &*j.expr {
            TypedExpr::Ambiguous { alts: ja, .. } => alts.extend(ja.iter().cloned()),
            _ => alts.push(j.clone()),
        }

        let expr = TypedExpr::Ambiguous { source, ty: i.type_of().clone(), alts };
        Interpretation::with_cost(Rc::new(expr), Env::new(), i.cost, i.arg_cost)
    }

    /// Flattens ambiguous interpretations into their alternatives.
    pub fn split_ambiguous(list: Vec<Rc<Interpretation>>) -> Vec<Rc<Interpretation>> {
        let mut out = Vec::with_capacity(list.len());
        for i in list {
            match &*i.expr {
                TypedExpr::Ambiguous { alts, .. } => out.extend(alts.iter().cloned()),
                _ => out.push(i),
            }
        }
        out
    }

    pub fn write(&self, f: &mut fmt::Formatter<'_>, style: Style) -> fmt::Result {
        let shown = self.env.replace(self.type_of());
        match style {
            Style::Default => {
                write!(f, "[{} / {}]", shown, self.cost)?;
                if !self.env.is_empty() {
                    write!(f, "{}", self.env)?;
                }
            }
            Style::Test => write!(f, "[{} / {}]", shown.plain(), self.cost)?,
        }
        write!(f, " ")?;
        self.expr.write(f, style)
    }

    /// Display adapter for test-style output.
    pub fn test_style(&self) -> TestStyle<'_> {
        TestStyle(self)
    }
}

impl fmt::Display for Interpretation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write(f, Style::Default)
    }
}

pub struct TestStyle<'a>(&'a Interpretation);

impl fmt::Display for TestStyle<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.write(f, Style::Test)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interp(cost: Cost) -> Rc<Interpretation> {
        Interpretation::with_cost(
            Rc::new(TypedExpr::Val(Ty::Conc(1))),
            Env::new(),
            cost,
            Cost::zero(),
        )
    }

    #[test]
    fn ordering_is_cost_then_arg_cost() {
        let a = interp(Cost::zero());
        let b = interp(Cost::from_safe(1));
        assert_eq!(Interpretation::compare(&a, &b), Ordering::Less);

        let c = Interpretation::with_cost(
            a.expr.clone(),
            Env::new(),
            Cost::zero(),
            Cost::from_safe(1),
        );
        assert_eq!(Interpretation::compare(&a, &c), Ordering::Less);
    }

    #[test]
    fn merge_ambiguous_flattens_alternatives() {
        let a = interp(Cost::zero());
        let b = interp(Cost::zero());
        let ab = Interpretation::merge_ambiguous(&a, &b);
        assert!(ab.is_ambiguous());

        let c = interp(Cost::zero());
        let abc = Interpretation::merge_ambiguous(&ab, &c);
        match &*abc.expr {
            TypedExpr::Ambiguous { alts, .. } => assert_eq!(alts.len(), 3),
            other => panic!("expected ambiguous node, got {other:?}"),
        }

        let split = Interpretation::split_ambiguous(vec![abc]);
        assert_eq!(split.len(), 3);
        assert!(split.iter().all(|i| !i.is_ambiguous()));
    }

    #[test]
    fn display_shows_cost_and_type() {
        let i = interp(Cost::from_safe(1));
        assert_eq!(i.to_string(), "[1 / (0,0,0,0,1)] 1");
    }
}
