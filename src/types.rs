//! The semantic type universe (spec §3.1) and its compatibility rule.
//!
//! Distinct from [`crate::ast::TypeExpr`], which is parse-tree syntax; a
//! `Type` is what the analyzer resolves that syntax to, with struct names
//! checked against the struct registry and no remaining unresolved names.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    Int,
    Float,
    String,
    Bool,
    Void,
    FixedArray(Box<Type>, u32),
    DynamicArray(Box<Type>),
    Map(Box<Type>, Box<Type>),
    Struct(String),
    /// A nullable handle to a struct or container value.
    Ref(Box<Type>),
}

impl Type {
    /// Whether a value of type `from` may be used where `to` is expected
    /// (spec §3.1). There is no implicit numeric promotion: `Int` and
    /// `Float` are never compatible with each other. `null` (modeled by the
    /// caller passing `from = Type::Ref(Box::new(Type::Void))` as a bottom
    /// marker is instead handled by [`Type::accepts_null`]) compares equal
    /// to any `Ref(_)`.
    pub fn is_assignable_to(&self, to: &Type) -> bool {
        match (self, to) {
            (a, b) if a == b => true,
            (Type::FixedArray(a, n), Type::FixedArray(b, m)) => n == m && a.is_assignable_to(b),
            (Type::DynamicArray(a), Type::DynamicArray(b)) => a.is_assignable_to(b),
            (Type::Map(ak, av), Type::Map(bk, bv)) => {
                ak.is_assignable_to(bk) && av.is_assignable_to(bv)
            }
            (Type::Ref(a), Type::Ref(b)) => a.is_assignable_to(b),
            _ => false,
        }
    }

    /// Whether this type can hold `null` — every `Ref(_)` handle, and
    /// nothing else (spec §3.1: "null is bottom, compatible with any
    /// `Ref(_)`").
    pub fn accepts_null(&self) -> bool {
        matches!(self, Type::Ref(_))
    }

    /// Whether this is one of the three container shapes that copy
    /// by-value at call boundaries unless passed behind `ref` (spec
    /// §4.4.3).
    pub fn is_container(&self) -> bool {
        matches!(self, Type::FixedArray(..) | Type::DynamicArray(_) | Type::Map(..))
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Type::Int | Type::Float)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => write!(f, "int"),
            Type::Float => write!(f, "float"),
            Type::String => write!(f, "string"),
            Type::Bool => write!(f, "bool"),
            Type::Void => write!(f, "void"),
            Type::FixedArray(t, n) => write!(f, "{t}[{n}]"),
            Type::DynamicArray(t) => write!(f, "{t}[]"),
            Type::Map(k, v) => write!(f, "map[{k}, {v}]"),
            Type::Struct(name) => write!(f, "{name}"),
            Type::Ref(t) => write!(f, "ref {t}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_and_float_are_not_interchangeable() {
        assert!(!Type::Int.is_assignable_to(&Type::Float));
        assert!(!Type::Float.is_assignable_to(&Type::Int));
    }

    #[test]
    fn fixed_array_lengths_must_match() {
        let a = Type::FixedArray(Box::new(Type::Int), 3);
        let b = Type::FixedArray(Box::new(Type::Int), 4);
        assert!(!a.is_assignable_to(&b));
    }

    #[test]
    fn ref_struct_accepts_null() {
        let t = Type::Ref(Box::new(Type::Struct("Node".into())));
        assert!(t.accepts_null());
        assert!(!Type::Struct("Node".into()).accepts_null());
    }

    #[test]
    fn nested_container_compatibility_is_structural() {
        let a = Type::DynamicArray(Box::new(Type::Int));
        let b = Type::DynamicArray(Box::new(Type::Int));
        assert!(a.is_assignable_to(&b));
    }
}
