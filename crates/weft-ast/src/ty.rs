//! Type representation for the Weft resolver.
//!
//! Defines the core `Ty` enum and the polymorphic type variable `PolyVar`.
//! Types are plain structural values: equality and hashing are defined on
//! the full tree, and tuples are kept in normal form (never nested, never
//! shorter than two elements).

use std::fmt;

/// A polymorphic type variable.
///
/// `id` 0 marks the declaration form of the variable; a nonzero `id`
/// identifies one instantiation of it. Instance ids are unique within the
/// scope of a single top-level resolution.
#[derive(Clone, Debug)]
pub struct PolyVar {
    pub name: String,
    pub id: u32,
}

impl PolyVar {
    pub fn new(name: impl Into<String>) -> Self {
        PolyVar { name: name.into(), id: 0 }
    }

    pub fn with_id(name: impl Into<String>, id: u32) -> Self {
        PolyVar { name: name.into(), id }
    }
}

impl PartialEq for PolyVar {
    fn eq(&self, other: &Self) -> bool {
        if self.id == 0 && other.id == 0 {
            self.name == other.name
        } else {
            self.id != 0 && self.id == other.id
        }
    }
}

impl Eq for PolyVar {}

impl std::hash::Hash for PolyVar {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        // Declaration-form variables are identified by name, instances by
        // id alone; hashing must follow the same split to stay consistent
        // with equality.
        if self.id == 0 {
            self.name.hash(state);
        } else {
            self.id.hash(state);
        }
    }
}

impl fmt::Display for PolyVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if self.id != 0 {
            write!(f, ".{}", self.id)?;
        }
        Ok(())
    }
}

/// A Weft type.
///
/// - `Conc`: a primitive numeric type, identified by a signed id
/// - `Named`: a nominal type, possibly generic over parameters
/// - `Poly`: a polymorphic type variable
/// - `Void`: the empty tuple (no value)
/// - `Tuple`: two or more types; never directly nested
/// - `Func`: a first-class function type
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Ty {
    Conc(i32),
    Named(String, Vec<Ty>),
    Poly(PolyVar),
    Void,
    Tuple(Vec<Ty>),
    Func(Vec<Ty>, Box<Ty>),
}

impl Ty {
    /// Create a named type with no parameters.
    pub fn named(name: impl Into<String>) -> Ty {
        Ty::Named(name.into(), Vec::new())
    }

    /// Create a declaration-form type variable.
    pub fn poly(name: impl Into<String>) -> Ty {
        Ty::Poly(PolyVar::new(name))
    }

    /// Create an instantiated type variable.
    pub fn poly_id(name: impl Into<String>, id: u32) -> Ty {
        Ty::Poly(PolyVar::with_id(name, id))
    }

    /// How many elemental types this type represents.
    pub fn size(&self) -> usize {
        match self {
            Ty::Void => 0,
            Ty::Tuple(els) => els.len(),
            _ => 1,
        }
    }

    /// Build a type of the appropriate arity from a list of component
    /// types: `Void` for none, the element itself for one, a tuple
    /// otherwise.
    pub fn from_list(mut tys: Vec<Ty>) -> Ty {
        match tys.len() {
            0 => Ty::Void,
            1 => tys.pop().unwrap_or(Ty::Void),
            _ => Ty::Tuple(tys),
        }
    }

    /// The component types of this type: tuple elements, or the type
    /// itself (empty for `Void`).
    pub fn components(&self) -> &[Ty] {
        match self {
            Ty::Void => &[],
            Ty::Tuple(els) => els,
            other => std::slice::from_ref(other),
        }
    }

    /// True iff the type contains a polymorphic variable anywhere.
    pub fn is_poly(&self) -> bool {
        match self {
            Ty::Poly(_) => true,
            Ty::Conc(_) | Ty::Void => false,
            Ty::Named(_, params) => params.iter().any(Ty::is_poly),
            Ty::Tuple(els) => els.iter().any(Ty::is_poly),
            Ty::Func(params, ret) => params.iter().any(Ty::is_poly) || ret.is_poly(),
        }
    }

    /// Rewrite every `Poly` leaf through `f`, sharing unchanged subtrees.
    /// Returns `None` when no leaf changed.
    pub fn map_poly(&self, f: &mut impl FnMut(&PolyVar) -> Option<Ty>) -> Option<Ty> {
        fn map_list(tys: &[Ty], f: &mut impl FnMut(&PolyVar) -> Option<Ty>) -> Option<Vec<Ty>> {
            let mut changed: Option<Vec<Ty>> = None;
            for (i, t) in tys.iter().enumerate() {
                if let Some(new) = t.map_poly(&mut *f) {
                    changed
                        .get_or_insert_with(|| tys[..i].to_vec())
                        .push(new);
                } else if let Some(out) = changed.as_mut() {
                    out.push(t.clone());
                }
            }
            changed
        }

        match self {
            Ty::Poly(v) => f(v),
            Ty::Conc(_) | Ty::Void => None,
            Ty::Named(name, params) => {
                map_list(params, &mut *f).map(|ps| Ty::Named(name.clone(), ps))
            }
            Ty::Tuple(els) => map_list(els, &mut *f).map(Ty::Tuple),
            Ty::Func(params, ret) => {
                let new_params = map_list(params, &mut *f);
                let new_ret = ret.map_poly(&mut *f);
                if new_params.is_none() && new_ret.is_none() {
                    return None;
                }
                Some(Ty::Func(
                    new_params.unwrap_or_else(|| params.clone()),
                    Box::new(new_ret.unwrap_or_else(|| (**ret).clone())),
                ))
            }
        }
    }

    /// Write the type without instance ids on variables, as it would
    /// appear in an input file.
    pub fn plain(&self) -> PlainTy<'_> {
        PlainTy(self)
    }

    fn write(&self, f: &mut fmt::Formatter<'_>, ids: bool) -> fmt::Result {
        match self {
            Ty::Conc(id) => write!(f, "{id}"),
            Ty::Named(name, params) => {
                write!(f, "#{name}")?;
                if !params.is_empty() {
                    write!(f, "<")?;
                    for (i, p) in params.iter().enumerate() {
                        if i > 0 {
                            write!(f, " ")?;
                        }
                        p.write(f, ids)?;
                    }
                    write!(f, ">")?;
                }
                Ok(())
            }
            Ty::Poly(v) => {
                if ids {
                    write!(f, "{v}")
                } else {
                    write!(f, "{}", v.name)
                }
            }
            Ty::Void => write!(f, "Void"),
            Ty::Tuple(els) => {
                for (i, t) in els.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    t.write(f, ids)?;
                }
                Ok(())
            }
            Ty::Func(params, ret) => {
                write!(f, "[ ")?;
                if ret.size() > 0 {
                    ret.write(f, ids)?;
                    write!(f, " ")?;
                }
                write!(f, ":")?;
                for p in params {
                    write!(f, " ")?;
                    p.write(f, ids)?;
                }
                write!(f, " ]")
            }
        }
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write(f, true)
    }
}

/// Display adapter that hides variable instance ids.
pub struct PlainTy<'a>(&'a Ty);

impl fmt::Display for PlainTy<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.write(f, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_follows_arity() {
        assert_eq!(Ty::Void.size(), 0);
        assert_eq!(Ty::Conc(1).size(), 1);
        assert_eq!(Ty::Tuple(vec![Ty::Conc(1), Ty::Conc(2)]).size(), 2);
        assert_eq!(Ty::Func(vec![Ty::Conc(1)], Box::new(Ty::Void)).size(), 1);
    }

    #[test]
    fn from_list_normalizes() {
        assert_eq!(Ty::from_list(vec![]), Ty::Void);
        assert_eq!(Ty::from_list(vec![Ty::Conc(3)]), Ty::Conc(3));
        assert_eq!(
            Ty::from_list(vec![Ty::Conc(1), Ty::Conc(2)]),
            Ty::Tuple(vec![Ty::Conc(1), Ty::Conc(2)])
        );
    }

    #[test]
    fn poly_identity_splits_on_id() {
        // declaration forms compare by name
        assert_eq!(PolyVar::new("T"), PolyVar::new("T"));
        assert_ne!(PolyVar::new("T"), PolyVar::new("S"));
        // instances compare by id only
        assert_eq!(PolyVar::with_id("T", 3), PolyVar::with_id("S", 3));
        assert_ne!(PolyVar::with_id("T", 3), PolyVar::with_id("T", 4));
        // declaration form never equals an instance
        assert_ne!(PolyVar::new("T"), PolyVar::with_id("T", 1));
    }

    #[test]
    fn func_of_void_is_not_void() {
        let f = Ty::Func(vec![], Box::new(Ty::Void));
        assert_ne!(f, Ty::Void);
        assert_eq!(f.size(), 1);
    }

    #[test]
    fn map_poly_shares_unchanged() {
        let t = Ty::Named("box".into(), vec![Ty::Conc(1)]);
        assert!(t.map_poly(&mut |_| Some(Ty::Conc(9))).is_none());

        let t = Ty::Tuple(vec![Ty::poly("T"), Ty::Conc(2)]);
        let mapped = t.map_poly(&mut |_| Some(Ty::Conc(1)));
        assert_eq!(mapped, Some(Ty::Tuple(vec![Ty::Conc(1), Ty::Conc(2)])));
    }

    #[test]
    fn display_matches_input_forms() {
        let t = Ty::Named("pair".into(), vec![Ty::Conc(1), Ty::poly("T")]);
        assert_eq!(t.to_string(), "#pair<1 T>");
        let f = Ty::Func(vec![Ty::Conc(1), Ty::Conc(2)], Box::new(Ty::Conc(3)));
        assert_eq!(f.to_string(), "[ 3 : 1 2 ]");
        let v = Ty::poly_id("T", 2);
        assert_eq!(v.to_string(), "T.2");
        assert_eq!(v.plain().to_string(), "T");
    }
}
