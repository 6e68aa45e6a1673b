//! Declarations: overloaded functions and first-class variables.
//!
//! Declaration identity is (name, tag); tags exist purely to tell
//! overloads apart in output.

use std::fmt;

use crate::forall::Forall;
use crate::ty::Ty;

/// A function declaration: named, tagged, with flattened parameter and
/// return types and an optional forall clause.
#[derive(Clone, Debug)]
pub struct FuncDecl {
    name: String,
    tag: String,
    params: Vec<Ty>,
    returns: Ty,
    forall: Option<Forall>,
}

impl FuncDecl {
    pub fn new(name: impl Into<String>, params: Vec<Ty>, returns: Ty) -> Self {
        FuncDecl::with_forall(name, "", params, returns, None)
    }

    pub fn with_forall(
        name: impl Into<String>,
        tag: impl Into<String>,
        params: Vec<Ty>,
        returns: Ty,
        forall: Option<Forall>,
    ) -> Self {
        FuncDecl {
            name: name.into(),
            tag: tag.into(),
            params,
            returns,
            forall: forall.filter(|f| !f.is_empty()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn params(&self) -> &[Ty] {
        &self.params
    }

    pub fn returns(&self) -> &Ty {
        &self.returns
    }

    pub fn forall(&self) -> Option<&Forall> {
        self.forall.as_ref()
    }

    /// The declaration's type as a first-class function value.
    pub fn fn_type(&self) -> Ty {
        Ty::Func(self.params.clone(), Box::new(self.returns.clone()))
    }
}

impl PartialEq for FuncDecl {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.tag == other.tag
    }
}

impl Eq for FuncDecl {}

impl std::hash::Hash for FuncDecl {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.tag.hash(state);
    }
}

impl fmt::Display for FuncDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.returns.size() > 0 {
            write!(f, "{} ", self.returns)?;
        }
        write!(f, "{}", self.name)?;
        if !self.tag.is_empty() {
            write!(f, "-{}", self.tag)?;
        }
        for p in &self.params {
            write!(f, " {p}")?;
        }
        if let Some(forall) = &self.forall {
            for a in forall.assertions() {
                write!(f, " | {a}")?;
            }
        }
        Ok(())
    }
}

/// A variable declaration; `&name` expressions resolve to these.
#[derive(Clone, Debug)]
pub struct VarDecl {
    name: String,
    tag: String,
    ty: Ty,
}

impl VarDecl {
    pub fn new(name: impl Into<String>, tag: impl Into<String>, ty: Ty) -> Self {
        VarDecl { name: name.into(), tag: tag.into(), ty }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn ty(&self) -> &Ty {
        &self.ty
    }
}

impl PartialEq for VarDecl {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.tag == other.tag
    }
}

impl Eq for VarDecl {}

impl fmt::Display for VarDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.ty, self.name)?;
        if !self.tag.is_empty() {
            write!(f, "-{}", self.tag)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_is_name_and_tag() {
        let a = FuncDecl::with_forall("f", "a", vec![Ty::Conc(1)], Ty::Conc(2), None);
        let b = FuncDecl::with_forall("f", "a", vec![Ty::Conc(3)], Ty::Conc(4), None);
        let c = FuncDecl::with_forall("f", "b", vec![Ty::Conc(1)], Ty::Conc(2), None);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn display_is_input_form() {
        let d = FuncDecl::with_forall("f", "a", vec![Ty::Conc(1), Ty::Conc(2)], Ty::Conc(3), None);
        assert_eq!(d.to_string(), "3 f-a 1 2");

        let v = FuncDecl::new("g", vec![Ty::Conc(3)], Ty::Void);
        assert_eq!(v.to_string(), "g 3");
    }

    #[test]
    fn fn_type_wraps_signature() {
        let d = FuncDecl::new("f", vec![Ty::Conc(1)], Ty::Conc(2));
        assert_eq!(
            d.fn_type(),
            Ty::Func(vec![Ty::Conc(1)], Box::new(Ty::Conc(2)))
        );
    }
}
