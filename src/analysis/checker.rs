//! Type checker: walks the AST once with an environment chain mirroring the
//! evaluator's own scope discipline (spec §4.3/§3.3).
//!
//! Grounded on the two-pass shape of the teacher's analyzer
//! (`discovery.rs` registers declarations, then a walk checks bodies
//! against the registry) — [`crate::analysis::registry::build_registry`]
//! plays the discovery role here, and `Checker` plays the walk.

use std::collections::HashMap;

use crate::ast::{BinaryOp, Block, Expr, FStringPart, Program, Stmt, TypeExpr, UnaryOp, UseKind};
use crate::builtins;
use crate::error::NoxyError;
use crate::scope::ScopeStack;
use crate::span::Span;
use crate::types::Type;

use super::registry::{resolve_type, Registry};

/// Result of a full program check: the registry (unchanged) plus the
/// resolved types of every top-level `global` — the evaluator needs the
/// latter to decide struct/container copy-on-assign.
pub struct Analysis {
    pub registry: Registry,
    pub global_types: HashMap<String, Type>,
}

pub fn check_program(program: &Program, registry: Registry) -> Result<Analysis, NoxyError> {
    check_program_with_prelude(program, registry, HashMap::new())
}

/// Like [`check_program`], but seeds the checker's globals with `prelude`
/// before the walk — used to splice in names pulled in by `use` (spec
/// §4.5), which must already be visible while checking the importing
/// module's own declarations.
pub fn check_program_with_prelude(
    program: &Program,
    registry: Registry,
    prelude: HashMap<String, Type>,
) -> Result<Analysis, NoxyError> {
    let mut checker = Checker::new(&registry);
    checker.globals = prelude;
    checker.locals.push_scope();
    for stmt in program {
        checker.check_top_level_stmt(stmt)?;
    }
    let global_types = checker.globals;
    Ok(Analysis { registry, global_types })
}

struct Checker<'a> {
    registry: &'a Registry,
    globals: HashMap<String, Type>,
    locals: ScopeStack<Type>,
    return_type: Option<Type>,
    loop_depth: u32,
}

/// Whether `from` may be used where `to` is expected, also accepting the
/// null-literal marker `Ref(Void)` (see `check_expr`'s handling of
/// `Expr::Null`) against any `Ref(_)` target.
fn compatible(from: &Type, to: &Type) -> bool {
    if is_null_marker(from) {
        return to.accepts_null();
    }
    from.is_assignable_to(to)
}

/// Whether `t` is the internal sentinel synthesized for a context-free
/// `null` literal (see `check_expr`'s `Expr::Null` arm) rather than a type
/// any legitimate `ref T` syntax can produce (`resolve_type` never resolves
/// `Ref` over `Void`).
fn is_null_marker(t: &Type) -> bool {
    matches!(t, Type::Ref(inner) if **inner == Type::Void)
}

impl<'a> Checker<'a> {
    fn new(registry: &'a Registry) -> Self {
        Checker {
            registry,
            globals: HashMap::new(),
            locals: ScopeStack::new(),
            return_type: None,
            loop_depth: 0,
        }
    }

    fn type_err(&self, message: impl Into<String>, span: Span) -> NoxyError {
        NoxyError::Type { message: message.into(), span }
    }

    fn resolve(&self, te: &TypeExpr, span: Span) -> Result<Type, NoxyError> {
        resolve_type(te, self.registry).map_err(|m| self.type_err(m, span))
    }

    fn lookup_var(&self, name: &str) -> Option<Type> {
        self.locals.lookup(name).cloned().or_else(|| self.globals.get(name).cloned())
    }

    // ---- statements ------------------------------------------------------

    /// Top-level statements may additionally be `global`, `func`, `struct`,
    /// or `use` (spec §4.3 "Scope rules": `global` is only valid at top
    /// level).
    fn check_top_level_stmt(&mut self, stmt: &Stmt) -> Result<(), NoxyError> {
        match stmt {
            Stmt::Global { name, ty, init, span } => {
                let declared = self.resolve(ty, *span)?;
                let found = self.check_expr(init, Some(&declared))?;
                if !compatible(&found, &declared) {
                    return Err(self.type_err(
                        format!("cannot assign '{found}' to global '{name}' declared '{declared}'"),
                        *span,
                    ));
                }
                if self.globals.contains_key(name) {
                    return Err(self.type_err(format!("global '{name}' is already declared"), *span));
                }
                self.globals.insert(name.clone(), declared);
                Ok(())
            }
            Stmt::FuncDecl(fd) => {
                let sig = self.registry.functions[&fd.name].clone();
                self.locals.push_scope();
                for p in &sig.params {
                    self.locals.bind(&p.name, p.ty.clone());
                }
                let prev_return = self.return_type.replace(sig.return_type.clone());
                let diverges = self.check_block(&fd.body)?;
                self.return_type = prev_return;
                self.locals.pop_scope();
                if sig.return_type != Type::Void && !diverges {
                    return Err(self.type_err(
                        format!(
                            "function '{}' declares return type '{}' but not all paths return",
                            fd.name, sig.return_type
                        ),
                        fd.span,
                    ));
                }
                Ok(())
            }
            Stmt::StructDecl(_) => Ok(()), // already validated by build_registry
            Stmt::Use(u) => self.check_use(u),
            other => self.check_stmt(other).map(|_| ()),
        }
    }

    fn check_use(&mut self, u: &crate::ast::UseDecl) -> Result<(), NoxyError> {
        // Full cross-module resolution is the module loader's job
        // (src/project/loader.rs); here we only validate the syntax forms
        // the analyzer is responsible for (spec §4.3 treats `use` as a
        // plain statement it walks over, deferring to the loader).
        if u.path.is_empty() {
            return Err(self.type_err("'use' requires a non-empty module path", u.span));
        }
        if let UseKind::Select(crate::ast::SelectList::Names(names)) = &u.kind {
            if names.is_empty() {
                return Err(self.type_err("'use ... select' requires at least one name", u.span));
            }
        }
        Ok(())
    }

    /// Checks a non-declaration statement; returns whether it diverges
    /// (always returns or breaks), for the reachability pass.
    fn check_stmt(&mut self, stmt: &Stmt) -> Result<bool, NoxyError> {
        match stmt {
            Stmt::Let { name, ty, init, span } => {
                let declared = self.resolve(ty, *span)?;
                let found = self.check_expr(init, Some(&declared))?;
                if !compatible(&found, &declared) {
                    return Err(self.type_err(
                        format!("cannot assign '{found}' to variable '{name}' declared '{declared}'"),
                        *span,
                    ));
                }
                if self.locals.bound_in_current_scope(name) {
                    return Err(self.type_err(format!("'{name}' is already declared in this scope"), *span));
                }
                self.locals.bind(name, declared);
                Ok(false)
            }
            Stmt::Global { span, .. } => {
                Err(self.type_err("'global' is only valid at the top level", *span))
            }
            Stmt::Assign { target, value, span } => {
                let target_ty = self.check_lvalue(target)?;
                let found = self.check_expr(value, Some(&target_ty))?;
                if !compatible(&found, &target_ty) {
                    return Err(self.type_err(
                        format!("cannot assign '{found}' to a slot of type '{target_ty}'"),
                        *span,
                    ));
                }
                Ok(false)
            }
            Stmt::ExprStmt { expr, .. } => {
                self.check_expr(expr, None)?;
                Ok(false)
            }
            Stmt::If { cond, then_block, else_block, span } => {
                let cty = self.check_expr(cond, Some(&Type::Bool))?;
                if cty != Type::Bool {
                    return Err(self.type_err(format!("if condition must be 'bool', found '{cty}'"), *span));
                }
                self.locals.push_scope();
                let then_diverges = self.check_block(then_block)?;
                self.locals.pop_scope();
                let else_diverges = match else_block {
                    Some(b) => {
                        self.locals.push_scope();
                        let d = self.check_block(b)?;
                        self.locals.pop_scope();
                        d
                    }
                    None => false,
                };
                Ok(then_diverges && else_diverges)
            }
            Stmt::While { cond, body, span } => {
                let cty = self.check_expr(cond, Some(&Type::Bool))?;
                if cty != Type::Bool {
                    return Err(self.type_err(format!("while condition must be 'bool', found '{cty}'"), *span));
                }
                self.loop_depth += 1;
                self.locals.push_scope();
                self.check_block(body)?;
                self.locals.pop_scope();
                self.loop_depth -= 1;
                // `while true` with no reachable `break` always returns
                // (spec §4.3); a precise break-reachability walk is out of
                // scope, so only the literal-`true`-with-no-break shape is
                // recognized.
                let always_true = matches!(cond, Expr::Bool { value: true, .. });
                Ok(always_true && !contains_break(body))
            }
            Stmt::Return { value, span } => {
                let expected = self.return_type.clone().ok_or_else(|| {
                    self.type_err("'return' outside of a function body", *span)
                })?;
                let found_ty = match value {
                    Some(e) => self.check_expr(e, Some(&expected))?,
                    None => Type::Void,
                };
                if !compatible(&found_ty, &expected) {
                    return Err(self.type_err(
                        format!("function returns '{expected}' but this 'return' produces '{found_ty}'"),
                        *span,
                    ));
                }
                Ok(true)
            }
            Stmt::Break { span } => {
                if self.loop_depth == 0 {
                    return Err(self.type_err("'break' outside of a loop", *span));
                }
                Ok(true)
            }
            Stmt::FuncDecl(fd) => {
                Err(self.type_err("nested function declarations are not supported", fd.span))
            }
            Stmt::StructDecl(sd) => {
                Err(self.type_err("struct declarations are only valid at the top level", sd.span))
            }
            Stmt::Use(u) => {
                Err(self.type_err("'use' is only valid at the top level", u.span))
            }
        }
    }

    fn check_block(&mut self, block: &Block) -> Result<bool, NoxyError> {
        let mut diverges = false;
        for stmt in &block.stmts {
            if self.check_stmt(stmt)? {
                diverges = true;
            }
        }
        Ok(diverges)
    }

    // ---- l-values ----------------------------------------------------------

    fn check_lvalue(&mut self, expr: &Expr) -> Result<Type, NoxyError> {
        match expr {
            Expr::Ident { name, span } => self
                .lookup_var(name)
                .ok_or_else(|| self.type_err(format!("undeclared identifier '{name}'"), *span)),
            Expr::Field { .. } | Expr::Index { .. } => self.check_expr(expr, None),
            other => Err(self.type_err("invalid l-value", other.span())),
        }
    }

    // ---- expressions ---------------------------------------------------

    fn check_expr(&mut self, expr: &Expr, expected: Option<&Type>) -> Result<Type, NoxyError> {
        match expr {
            Expr::Int { .. } => Ok(Type::Int),
            Expr::Float { .. } => Ok(Type::Float),
            Expr::Str { .. } => Ok(Type::String),
            Expr::Bool { .. } => Ok(Type::Bool),
            Expr::Null { .. } => match expected {
                Some(Type::Ref(inner)) => Ok(Type::Ref(inner.clone())),
                _ => Ok(Type::Ref(Box::new(Type::Void))),
            },
            Expr::FString { parts, span } => self.check_fstring(parts, *span),
            Expr::Ident { name, span } => self
                .lookup_var(name)
                .ok_or_else(|| self.type_err(format!("undeclared identifier '{name}'"), *span)),
            Expr::Unary { op, expr: inner, span } => self.check_unary(*op, inner, *span),
            Expr::Binary { op, left, right, span } => self.check_binary(*op, left, right, *span),
            Expr::Field { target, name, span } => self.check_field(target, name, *span),
            Expr::Index { target, index, span } => self.check_index(target, index, *span),
            Expr::Call { callee, args, span } => self.check_call(callee, args, *span),
            Expr::ArrayLiteral { elements, span } => self.check_array_literal(elements, expected, *span),
            Expr::Zeros { count, span } => self.check_zeros(count, expected, *span),
            Expr::Ref { target, span } => self.check_ref(target, *span),
        }
    }

    fn check_unary(&mut self, op: UnaryOp, inner: &Expr, span: Span) -> Result<Type, NoxyError> {
        let ty = self.check_expr(inner, None)?;
        match op {
            UnaryOp::Neg if ty == Type::Int || ty == Type::Float => Ok(ty),
            UnaryOp::Neg => Err(self.type_err(format!("unary '-' requires int or float, found '{ty}'"), span)),
            UnaryOp::Not if ty == Type::Bool => Ok(Type::Bool),
            UnaryOp::Not => Err(self.type_err(format!("unary '!' requires bool, found '{ty}'"), span)),
        }
    }

    fn check_binary(&mut self, op: BinaryOp, left: &Expr, right: &Expr, span: Span) -> Result<Type, NoxyError> {
        use BinaryOp::*;
        match op {
            And | Or => {
                let lt = self.check_expr(left, Some(&Type::Bool))?;
                let rt = self.check_expr(right, Some(&Type::Bool))?;
                if lt != Type::Bool || rt != Type::Bool {
                    return Err(self.type_err(
                        format!("'{}' requires bool operands, found '{lt}' and '{rt}'", op_symbol(op)),
                        span,
                    ));
                }
                Ok(Type::Bool)
            }
            Add => {
                let lt = self.check_expr(left, None)?;
                let rt = self.check_expr(right, Some(&lt))?;
                match (&lt, &rt) {
                    (Type::Int, Type::Int) => Ok(Type::Int),
                    (Type::Float, Type::Float) => Ok(Type::Float),
                    (Type::String, Type::String) => Ok(Type::String),
                    _ => Err(self.type_err(
                        format!("'+' requires matching int, float, or string operands, found '{lt}' and '{rt}'"),
                        span,
                    )),
                }
            }
            Sub | Mul | Div | Mod => {
                let lt = self.check_expr(left, None)?;
                let rt = self.check_expr(right, Some(&lt))?;
                match (&lt, &rt) {
                    (Type::Int, Type::Int) => Ok(Type::Int),
                    (Type::Float, Type::Float) => Ok(Type::Float),
                    _ => Err(self.type_err(
                        format!(
                            "'{}' requires matching int or float operands, found '{lt}' and '{rt}'",
                            op_symbol(op)
                        ),
                        span,
                    )),
                }
            }
            Lt | Gt | LtEq | GtEq => {
                let lt = self.check_expr(left, None)?;
                let rt = self.check_expr(right, Some(&lt))?;
                if lt != rt || !lt.is_numeric() {
                    return Err(self.type_err(
                        format!("'{}' requires two operands of the same numeric type, found '{lt}' and '{rt}'", op_symbol(op)),
                        span,
                    ));
                }
                Ok(Type::Bool)
            }
            EqEq | NotEq => {
                let lt = self.check_expr(left, None)?;
                let rt = self.check_expr(right, Some(&lt))?;
                let ok = lt == rt
                    || (matches!(lt, Type::Ref(_)) && is_null_marker(&rt))
                    || (matches!(rt, Type::Ref(_)) && is_null_marker(&lt));
                if !ok {
                    return Err(self.type_err(
                        format!("cannot compare '{lt}' and '{rt}' for equality"),
                        span,
                    ));
                }
                Ok(Type::Bool)
            }
        }
    }

    /// Returns `Some("alias.name")` when `target` is a bare identifier that
    /// names a loaded namespace rather than a variable (spec §4.5
    /// "`m.name` lookup"); variables shadow a same-named namespace.
    fn namespace_qualified(&self, target: &Expr, name: &str) -> Option<String> {
        let Expr::Ident { name: target_name, .. } = target else { return None };
        if self.lookup_var(target_name).is_some() {
            return None;
        }
        if self.registry.namespaces.contains(target_name) {
            Some(format!("{target_name}.{name}"))
        } else {
            None
        }
    }

    fn check_field(&mut self, target: &Expr, name: &str, span: Span) -> Result<Type, NoxyError> {
        if let Some(qualified) = self.namespace_qualified(target, name) {
            let Expr::Ident { name: ns, .. } = target else { unreachable!() };
            return self
                .globals
                .get(&qualified)
                .cloned()
                .ok_or_else(|| self.type_err(format!("namespace '{ns}' has no exported global '{name}'"), span));
        }
        let target_ty = self.check_expr(target, None)?;
        let struct_name = match &target_ty {
            Type::Struct(n) => n,
            Type::Ref(inner) => match &**inner {
                Type::Struct(n) => n,
                _ => return Err(self.type_err(format!("'.{name}' requires a struct, found '{target_ty}'"), span)),
            },
            _ => return Err(self.type_err(format!("'.{name}' requires a struct, found '{target_ty}'"), span)),
        };
        let info = &self.registry.structs[struct_name];
        info.field_type(name)
            .cloned()
            .ok_or_else(|| self.type_err(format!("struct '{struct_name}' has no field '{name}'"), span))
    }

    fn check_index(&mut self, target: &Expr, index: &Expr, span: Span) -> Result<Type, NoxyError> {
        let target_ty = self.check_expr(target, None)?;
        match &target_ty {
            Type::FixedArray(elem, _) | Type::DynamicArray(elem) => {
                let it = self.check_expr(index, Some(&Type::Int))?;
                if it != Type::Int {
                    return Err(self.type_err(format!("array index must be 'int', found '{it}'"), span));
                }
                Ok((**elem).clone())
            }
            Type::Map(key, value) => {
                let it = self.check_expr(index, Some(key))?;
                if !compatible(&it, key) {
                    return Err(self.type_err(format!("map key must be '{key}', found '{it}'"), span));
                }
                Ok((**value).clone())
            }
            Type::String => {
                let it = self.check_expr(index, Some(&Type::Int))?;
                if it != Type::Int {
                    return Err(self.type_err(format!("string index must be 'int', found '{it}'"), span));
                }
                Ok(Type::String)
            }
            other => Err(self.type_err(format!("'{other}' is not indexable"), span)),
        }
    }

    fn check_ref(&mut self, target: &Expr, span: Span) -> Result<Type, NoxyError> {
        if !target.is_lvalue() {
            return Err(self.type_err("'ref' requires an addressable expression", span));
        }
        let ty = self.check_lvalue(target)?;
        match ty {
            Type::Struct(name) => Ok(Type::Ref(Box::new(Type::Struct(name)))),
            other => Err(self.type_err(format!("'ref' requires a struct-valued l-value, found '{other}'"), span)),
        }
    }

    fn check_array_literal(
        &mut self,
        elements: &[Expr],
        expected: Option<&Type>,
        span: Span,
    ) -> Result<Type, NoxyError> {
        match expected {
            Some(Type::FixedArray(elem, n)) => {
                if elements.len() as u32 != *n {
                    return Err(self.type_err(
                        format!("array literal has {} element(s), expected {n}", elements.len()),
                        span,
                    ));
                }
                for e in elements {
                    let t = self.check_expr(e, Some(elem))?;
                    if !compatible(&t, elem) {
                        return Err(self.type_err(
                            format!("array element has type '{t}', expected '{elem}'"),
                            e.span(),
                        ));
                    }
                }
                Ok(Type::FixedArray(elem.clone(), *n))
            }
            Some(Type::DynamicArray(elem)) => {
                for e in elements {
                    let t = self.check_expr(e, Some(elem))?;
                    if !compatible(&t, elem) {
                        return Err(self.type_err(
                            format!("array element has type '{t}', expected '{elem}'"),
                            e.span(),
                        ));
                    }
                }
                Ok(Type::DynamicArray(elem.clone()))
            }
            _ => {
                let Some(first) = elements.first() else {
                    return Err(self.type_err("cannot infer the type of an empty array literal here", span));
                };
                let elem = self.check_expr(first, None)?;
                for e in &elements[1..] {
                    let t = self.check_expr(e, Some(&elem))?;
                    if !compatible(&t, &elem) {
                        return Err(self.type_err(
                            format!("array literal mixes '{elem}' and '{t}'"),
                            e.span(),
                        ));
                    }
                }
                Ok(Type::DynamicArray(Box::new(elem)))
            }
        }
    }

    fn check_zeros(&mut self, count: &Expr, expected: Option<&Type>, span: Span) -> Result<Type, NoxyError> {
        let ct = self.check_expr(count, Some(&Type::Int))?;
        if ct != Type::Int {
            return Err(self.type_err(format!("'zeros' expects an int argument, found '{ct}'"), span));
        }
        let check_elem = |elem: &Type| -> Result<(), NoxyError> {
            if matches!(elem, Type::Int | Type::Float | Type::Bool | Type::String) {
                Ok(())
            } else {
                Err(self.type_err(
                    format!("'zeros' can only fill int, float, bool, or string elements, found '{elem}'"),
                    span,
                ))
            }
        };
        match expected {
            Some(Type::FixedArray(elem, n)) => {
                check_elem(elem)?;
                Ok(Type::FixedArray(elem.clone(), *n))
            }
            Some(Type::DynamicArray(elem)) => {
                check_elem(elem)?;
                Ok(Type::DynamicArray(elem.clone()))
            }
            _ => Err(self.type_err("cannot infer the element type of 'zeros' here", span)),
        }
    }

    fn check_call(&mut self, callee: &Expr, args: &[Expr], span: Span) -> Result<Type, NoxyError> {
        let (qualified, callee_span) = match callee {
            Expr::Ident { name, span: callee_span } => (name.clone(), *callee_span),
            Expr::Field { target, name, span: callee_span } => match self.namespace_qualified(target, name) {
                Some(q) => (q, *callee_span),
                None => {
                    return Err(self.type_err("call target must be a function, struct, or built-in name", span))
                }
            },
            _ => return Err(self.type_err("call target must be a function, struct, or built-in name", span)),
        };
        let name = &qualified;
        let callee_span = &callee_span;

        if let Some(info) = self.registry.structs.get(name) {
            if args.len() != info.fields.len() {
                return Err(self.type_err(
                    format!(
                        "struct '{name}' constructor expects {} argument(s), found {}",
                        info.fields.len(),
                        args.len()
                    ),
                    span,
                ));
            }
            let fields = info.fields.clone();
            for (arg, (fname, fty)) in args.iter().zip(fields.iter()) {
                let at = self.check_expr(arg, Some(fty))?;
                if !compatible(&at, fty) {
                    return Err(self.type_err(
                        format!("field '{fname}' expects '{fty}', found '{at}'"),
                        arg.span(),
                    ));
                }
            }
            return Ok(Type::Struct(name.clone()));
        }

        if let Some(sig) = self.registry.functions.get(name).cloned() {
            if args.len() != sig.params.len() {
                return Err(self.type_err(
                    format!("function '{name}' expects {} argument(s), found {}", sig.params.len(), args.len()),
                    span,
                ));
            }
            for (arg, param) in args.iter().zip(sig.params.iter()) {
                let at = self.check_expr(arg, Some(&param.ty))?;
                if !compatible(&at, &param.ty) {
                    return Err(self.type_err(
                        format!("parameter '{}' expects '{}', found '{at}'", param.name, param.ty),
                        arg.span(),
                    ));
                }
                if param.by_ref && !arg.is_lvalue() {
                    return Err(self.type_err(
                        format!("parameter '{}' is by-reference and requires an addressable argument", param.name),
                        arg.span(),
                    ));
                }
            }
            return Ok(sig.return_type.clone());
        }

        if builtins::is_builtin(name) {
            let mut arg_types = Vec::with_capacity(args.len());
            for a in args {
                arg_types.push(self.check_expr(a, None)?);
            }
            return builtins::check_signature(name, &arg_types, span);
        }

        Err(self.type_err(format!("undeclared function, struct, or built-in '{name}'"), *callee_span))
    }

    fn check_fstring(&mut self, parts: &[FStringPart], span: Span) -> Result<Type, NoxyError> {
        for part in parts {
            if let FStringPart::Hole { expr, spec } = part {
                let ty = self.check_expr(expr, None)?;
                if let Some(spec) = spec {
                    if let Some(t) = spec.ty {
                        match t {
                            'x' | 'X' | 'o' if ty != Type::Int => {
                                return Err(self.type_err(
                                    format!("format type '{t}' requires 'int', found '{ty}'"),
                                    span,
                                ));
                            }
                            'f' | 'e' | 'g' if ty != Type::Float => {
                                return Err(self.type_err(
                                    format!("format type '{t}' requires 'float', found '{ty}'"),
                                    span,
                                ));
                            }
                            _ => {}
                        }
                    }
                    if spec.precision.is_some() && spec.ty.is_some_and(|t| !matches!(t, 'f' | 'e' | 'g')) {
                        return Err(self.type_err("'.precision' is only valid with a float format", span));
                    }
                }
            }
        }
        Ok(Type::String)
    }
}

fn op_symbol(op: crate::ast::BinaryOp) -> &'static str {
    use crate::ast::BinaryOp::*;
    match op {
        Add => "+",
        Sub => "-",
        Mul => "*",
        Div => "/",
        Mod => "%",
        Lt => "<",
        Gt => ">",
        LtEq => "<=",
        GtEq => ">=",
        EqEq => "==",
        NotEq => "!=",
        And => "&",
        Or => "|",
    }
}

/// Conservative "does this block contain a `break`" check used only to
/// decide whether a `while true { ... }` with no escape counts as
/// diverging (spec §4.3's reachability rule). Does not descend into
/// nested `while` bodies, since a `break` there targets that inner loop.
fn contains_break(block: &Block) -> bool {
    block.stmts.iter().any(|s| match s {
        Stmt::Break { .. } => true,
        Stmt::If { then_block, else_block, .. } => {
            contains_break(then_block) || else_block.as_ref().is_some_and(contains_break)
        }
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::registry::build_registry;
    use crate::parser::parse_program;

    fn check(src: &str) -> Result<Analysis, NoxyError> {
        let prog = parse_program(src).unwrap();
        let registry = build_registry(&prog).unwrap();
        check_program(&prog, registry)
    }

    #[test]
    fn rejects_int_plus_float() {
        assert!(check("let x: int = 1 + 1.0").is_err());
    }

    #[test]
    fn accepts_string_concatenation() {
        assert!(check(r#"let x: string = "a" + "b""#).is_ok());
    }

    #[test]
    fn fibonacci_type_checks() {
        let src = "func fib(n:int)->int if n<2 then return n else return fib(n-1)+fib(n-2) end end";
        assert!(check(src).is_ok());
    }

    #[test]
    fn non_void_function_must_return_on_all_paths() {
        let src = "func f(n:int)->int if n<2 then return 1 end end";
        assert!(check(src).is_err());
    }

    #[test]
    fn global_is_rejected_inside_a_function() {
        let src = "func f()->void global x: int = 1 end";
        assert!(check(src).is_err());
    }

    #[test]
    fn ref_of_non_struct_is_rejected() {
        let src = "let x: int = 1\nlet y: ref x = ref x";
        assert!(check(src).is_err());
    }

    #[test]
    fn struct_constructor_checks_field_count_and_types() {
        let src = "struct Point x:int, y:int end\nlet p: Point = Point(1, 2)";
        assert!(check(src).is_ok());
        let bad = "struct Point x:int, y:int end\nlet p: Point = Point(1)";
        assert!(check(bad).is_err());
    }

    #[test]
    fn null_is_only_assignable_to_ref_types() {
        let ok = "struct Node v:int end\nlet n: ref Node = null";
        assert!(check(ok).is_ok());
        let bad = "let n: int = null";
        assert!(check(bad).is_err());
    }

    #[test]
    fn break_outside_loop_is_rejected() {
        assert!(check("break").is_err());
    }

    #[test]
    fn fstring_hex_hole_requires_int() {
        let ok = r#"let n: int = 42
print(f"{n:x}")"#;
        assert!(check(ok).is_ok());
        let bad = r#"let n: float = 1.0
print(f"{n:x}")"#;
        assert!(check(bad).is_err());
    }
}
