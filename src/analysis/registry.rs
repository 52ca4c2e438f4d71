//! Struct and function signature registry, built in a pre-pass over the
//! program so declarations can forward-reference each other (spec §4.3).
//!
//! Grounded on the shape of the teacher's `TypeRegistry` in
//! `examples/Brahmastra-Labs-logicaffeine/src/analysis/registry.rs` — a flat
//! name-to-definition map populated before the main walk — generalized from
//! the teacher's NLP type catalogue (primitives/structs/enums/generics) down
//! to Noxy's closed universe of structs and function signatures.

use std::collections::{HashMap, HashSet};

use crate::ast::{Program, Stmt, TypeExpr};
use crate::error::NoxyError;
use crate::span::Span;
use crate::types::Type;

#[derive(Debug, Clone)]
pub struct StructInfo {
    /// Fields in declaration order — constructor calls bind positionally
    /// against this order (spec §4.3 "Calls").
    pub fields: Vec<(String, Type)>,
}

impl StructInfo {
    pub fn field_type(&self, name: &str) -> Option<&Type> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, t)| t)
    }

    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|(n, _)| n.clone()).collect()
    }
}

#[derive(Debug, Clone)]
pub struct ParamInfo {
    pub name: String,
    pub ty: Type,
    /// True for a container parameter declared `ref T[]` / `ref T[N]` /
    /// `ref map[K, V]` — a parameter-passing mode, not a `Type::Ref` value
    /// (spec §3.1 restricts `Ref` to struct/nominal types; §4.4.3 describes
    /// `ref T_container` as a separate by-reference calling convention).
    pub by_ref: bool,
}

#[derive(Debug, Clone)]
pub struct FunctionInfo {
    pub params: Vec<ParamInfo>,
    pub return_type: Type,
}

#[derive(Debug, Default)]
pub struct Registry {
    pub structs: HashMap<String, StructInfo>,
    pub functions: HashMap<String, FunctionInfo>,
    /// Identifiers bound to an imported module rather than a variable (spec
    /// §4.5 "Namespacing"). A namespace alias `m` has no `Type` of its own;
    /// the checker and evaluator special-case `Expr::Field`/`Expr::Call`
    /// whose target is an `Ident` found here, redirecting the lookup to the
    /// `"m.name"` keys this module's declarations were aliased under (see
    /// `project::loader::Loader::alias_module`).
    pub namespaces: HashSet<String>,
}

/// Builds the struct/function registry in three passes: struct names (so
/// self- and forward-references resolve), struct fields, then function
/// signatures.
pub fn build_registry(program: &Program) -> Result<Registry, NoxyError> {
    build_registry_from(Registry::default(), program)
}

/// Like [`build_registry`], but extends an existing registry instead of
/// starting from an empty one — used by the module loader to let a module's
/// own declarations reference structs/functions pulled in by its own `use`
/// statements (spec §4.5). Names already present in `registry` are treated
/// exactly like names declared earlier in the same file: redeclaring one is
/// the same "already declared" error either way.
pub fn build_registry_from(mut registry: Registry, program: &Program) -> Result<Registry, NoxyError> {
    for stmt in program {
        if let Stmt::StructDecl(sd) = stmt {
            if registry.structs.contains_key(&sd.name) {
                return Err(type_err(format!("struct '{}' is already declared", sd.name), sd.span));
            }
            registry.structs.insert(sd.name.clone(), StructInfo { fields: Vec::new() });
        }
    }

    for stmt in program {
        if let Stmt::StructDecl(sd) = stmt {
            let mut fields = Vec::new();
            for f in &sd.fields {
                if let TypeExpr::Named(n) = &f.ty {
                    if n == &sd.name {
                        return Err(type_err(
                            format!(
                                "field '{}' embeds '{}' by value; self-reference requires 'ref {}'",
                                f.name, n, n
                            ),
                            f.span,
                        ));
                    }
                }
                let ty = resolve_type(&f.ty, &registry).map_err(|m| type_err(m, f.span))?;
                fields.push((f.name.clone(), ty));
            }
            registry.structs.get_mut(&sd.name).unwrap().fields = fields;
        }
    }

    for stmt in program {
        if let Stmt::FuncDecl(fd) = stmt {
            if registry.functions.contains_key(&fd.name) {
                return Err(type_err(format!("function '{}' is already declared", fd.name), fd.span));
            }
            if registry.structs.contains_key(&fd.name) {
                return Err(type_err(
                    format!("function '{}' collides with a struct of the same name", fd.name),
                    fd.span,
                ));
            }
            let mut params = Vec::new();
            for p in &fd.params {
                let (ty, by_ref) = resolve_param_type(&p.ty, &registry).map_err(|m| type_err(m, p.span))?;
                params.push(ParamInfo { name: p.name.clone(), ty, by_ref });
            }
            let return_type =
                resolve_type(&fd.return_type, &registry).map_err(|m| type_err(m, fd.span))?;
            registry.functions.insert(fd.name.clone(), FunctionInfo { params, return_type });
        }
    }

    Ok(registry)
}

fn type_err(message: String, span: Span) -> NoxyError {
    NoxyError::Type { message, span }
}

fn is_container_type_expr(te: &TypeExpr) -> bool {
    matches!(te, TypeExpr::DynamicArray(_) | TypeExpr::FixedArray(..) | TypeExpr::Map(..))
}

/// Resolves a parameter's type syntax, also reporting whether it used the
/// `ref T_container` by-reference container modifier (spec §4.4.3 point 2).
fn resolve_param_type(te: &TypeExpr, registry: &Registry) -> Result<(Type, bool), String> {
    if let TypeExpr::Ref(inner) = te {
        if is_container_type_expr(inner) {
            return Ok((resolve_type(inner, registry)?, true));
        }
    }
    Ok((resolve_type(te, registry)?, false))
}

/// Resolves source type syntax to the semantic [`Type`] (spec §3.1/§4.2).
/// `Ref` only ever wraps a struct type here — the container-by-reference
/// case is parameter-position-only and handled by [`resolve_param_type`].
pub fn resolve_type(te: &TypeExpr, registry: &Registry) -> Result<Type, String> {
    Ok(match te {
        TypeExpr::Int => Type::Int,
        TypeExpr::Float => Type::Float,
        TypeExpr::String => Type::String,
        TypeExpr::Bool => Type::Bool,
        TypeExpr::Void => Type::Void,
        TypeExpr::Named(name) => {
            if registry.structs.contains_key(name) {
                Type::Struct(name.clone())
            } else {
                return Err(format!("unknown type '{name}'"));
            }
        }
        TypeExpr::DynamicArray(inner) => Type::DynamicArray(Box::new(resolve_type(inner, registry)?)),
        TypeExpr::FixedArray(inner, n) => {
            Type::FixedArray(Box::new(resolve_type(inner, registry)?), *n)
        }
        TypeExpr::Map(k, v) => {
            let kt = resolve_type(k, registry)?;
            if !matches!(kt, Type::Int | Type::String | Type::Bool) {
                return Err(format!("map key type must be int, string, or bool; found '{kt}'"));
            }
            Type::Map(Box::new(kt), Box::new(resolve_type(v, registry)?))
        }
        TypeExpr::Ref(inner) => {
            let it = resolve_type(inner, registry)?;
            if !matches!(it, Type::Struct(_)) {
                return Err(format!("'ref' may only reference a struct type; found '{it}'"));
            }
            Type::Ref(Box::new(it))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_program;

    #[test]
    fn registers_struct_fields_in_declaration_order() {
        let prog = parse_program("struct Point x:int, y:int end").unwrap();
        let reg = build_registry(&prog).unwrap();
        let info = &reg.structs["Point"];
        assert_eq!(info.field_names(), vec!["x".to_string(), "y".to_string()]);
    }

    #[test]
    fn self_reference_requires_ref() {
        let prog = parse_program("struct Node valor:int, proximo:Node end").unwrap();
        assert!(build_registry(&prog).is_err());
    }

    #[test]
    fn self_reference_through_ref_is_allowed() {
        let prog = parse_program("struct Node valor:int, proximo:ref Node end").unwrap();
        assert!(build_registry(&prog).is_ok());
    }

    #[test]
    fn ref_container_param_is_marked_by_ref_without_wrapping_the_type() {
        let prog = parse_program("func sort(a: ref int[]) -> void end").unwrap();
        let reg = build_registry(&prog).unwrap();
        let param = &reg.functions["sort"].params[0];
        assert!(param.by_ref);
        assert_eq!(param.ty, Type::DynamicArray(Box::new(Type::Int)));
    }

    #[test]
    fn ref_may_not_wrap_a_primitive() {
        let prog = parse_program("func f(a: ref int) -> void end").unwrap();
        assert!(build_registry(&prog).is_err());
    }
}
