//! Tree-walking evaluator (spec §4.4, §9 "Evaluator control flow").
//!
//! Grounded on the teacher's `Interpreter` in
//! `examples/Brahmastra-Labs-logicaffeine/src/interpreter.rs`: a
//! `Vec<HashMap<_, _>>` scope stack, a `ControlFlow { Continue, Return,
//! Break }` signal threaded back up through `execute_stmt`/`execute_block`
//! instead of Rust-level exceptions, and a flat `functions` map consulted by
//! name at call sites. This evaluator additionally tracks each binding's
//! *declared* type alongside its value — the teacher's `RuntimeValue` never
//! needs to since its structs have no `ref`/value-semantics distinction, but
//! Noxy's copy-on-bind rule (spec §4.4.3) can't be recovered from a bare
//! runtime value (`Value::Struct` looks identical whether the slot holding
//! it is `Struct` or `Ref(Struct)`).

use std::collections::HashMap;
use std::rc::Rc;

use crate::analysis::registry::{FunctionInfo, Registry};
use crate::ast::{BinaryOp, Block, Expr, FStringPart, FuncDecl, Program, Stmt, UnaryOp};
use crate::builtins::{self, RuntimeFault};
use crate::error::NoxyError;
use crate::scope::ScopeStack;
use crate::span::Span;
use crate::types::Type;
use crate::value::{Handle, Heap, HeapObject, MapObject, StructInstance, Value};

/// Control-flow signal propagated up from statement execution, mirroring
/// the teacher's `ControlFlow` enum.
pub enum Signal {
    Normal,
    Return(Value),
    Break,
}

fn runtime_err(message: impl Into<String>, span: Span) -> NoxyError {
    NoxyError::Runtime { message: message.into(), span }
}

fn fault_err(fault: RuntimeFault, span: Span) -> NoxyError {
    runtime_err(fault.message(), span)
}

/// Tree-walking evaluator. Carries a `&mut Heap` rather than owning it so a
/// module's interpreter (see `crate::project::loader`) shares identity with
/// whatever program imported it.
pub struct Interpreter<'a> {
    registry: &'a Registry,
    functions: &'a HashMap<String, Rc<FuncDecl>>,
    heap: &'a mut Heap,
    globals: HashMap<String, (Type, Value)>,
    locals: ScopeStack<(Type, Value)>,
    output: &'a mut Vec<String>,
    call_depth: u32,
}

/// Soft recursion limit (spec §5 "a fatal runtime error unwinds the
/// evaluator stack immediately"): unbounded recursion becomes a reported
/// `RuntimeError` instead of overflowing the host stack.
const MAX_CALL_DEPTH: u32 = 10_000;

impl<'a> Interpreter<'a> {
    pub fn new(
        registry: &'a Registry,
        functions: &'a HashMap<String, Rc<FuncDecl>>,
        heap: &'a mut Heap,
        output: &'a mut Vec<String>,
    ) -> Self {
        Interpreter {
            registry,
            functions,
            heap,
            globals: HashMap::new(),
            locals: ScopeStack::new(),
            output,
            call_depth: 0,
        }
    }

    /// Seeds this interpreter's globals before a run — used to splice in
    /// names pulled in by `use ... select` (spec §4.5).
    pub fn seed_globals(&mut self, values: HashMap<String, (Type, Value)>) {
        self.globals.extend(values);
    }

    pub fn into_globals(self) -> HashMap<String, (Type, Value)> {
        self.globals
    }

    /// Runs a module's or the main file's top-level statements as their own
    /// frame (spec §3.3: top-level `let` is local to this frame; only
    /// `global` populates `self.globals`, which every function call sees).
    pub fn run_top_level(&mut self, program: &Program) -> Result<(), NoxyError> {
        self.locals.push_scope();
        for stmt in program {
            self.execute_top_level_stmt(stmt)?;
        }
        self.locals.pop_scope();
        Ok(())
    }

    fn execute_top_level_stmt(&mut self, stmt: &Stmt) -> Result<(), NoxyError> {
        match stmt {
            Stmt::Global { name, ty, init, span } => {
                let declared = crate::analysis::registry::resolve_type(ty, self.registry)
                    .map_err(|m| runtime_err(m, *span))?;
                let value = self.evaluate_expr(init, Some(&declared))?;
                let value = self.materialize(&declared, value);
                self.globals.insert(name.clone(), (declared, value));
                Ok(())
            }
            // Declarations are hoisted by the caller before the run starts;
            // `use` is resolved entirely at load time (see project::loader).
            Stmt::FuncDecl(_) | Stmt::StructDecl(_) | Stmt::Use(_) => Ok(()),
            other => {
                self.execute_stmt(other)?;
                Ok(())
            }
        }
    }

    fn execute_block(&mut self, block: &Block) -> Result<Signal, NoxyError> {
        self.locals.push_scope();
        let mut signal = Signal::Normal;
        for stmt in &block.stmts {
            signal = self.execute_stmt(stmt)?;
            if !matches!(signal, Signal::Normal) {
                break;
            }
        }
        self.locals.pop_scope();
        Ok(signal)
    }

    fn execute_stmt(&mut self, stmt: &Stmt) -> Result<Signal, NoxyError> {
        match stmt {
            Stmt::Let { name, ty, init, span } => {
                let declared = crate::analysis::registry::resolve_type(ty, self.registry)
                    .map_err(|m| runtime_err(m, *span))?;
                let value = self.evaluate_expr(init, Some(&declared))?;
                let value = self.materialize(&declared, value);
                self.locals.bind(name, (declared, value));
                Ok(Signal::Normal)
            }
            Stmt::Assign { target, value, span } => {
                let declared = self.lvalue_type(target)?;
                let new_value = self.evaluate_expr(value, Some(&declared))?;
                let new_value = self.materialize(&declared, new_value);
                self.assign_lvalue(target, new_value, *span)?;
                Ok(Signal::Normal)
            }
            Stmt::ExprStmt { expr, .. } => {
                self.evaluate_expr(expr, None)?;
                Ok(Signal::Normal)
            }
            Stmt::If { cond, then_block, else_block, .. } => {
                if self.evaluate_expr(cond, Some(&Type::Bool))?.is_truthy() {
                    self.execute_block(then_block)
                } else if let Some(b) = else_block {
                    self.execute_block(b)
                } else {
                    Ok(Signal::Normal)
                }
            }
            Stmt::While { cond, body, .. } => {
                loop {
                    if !self.evaluate_expr(cond, Some(&Type::Bool))?.is_truthy() {
                        break;
                    }
                    match self.execute_block(body)? {
                        Signal::Break => break,
                        Signal::Return(v) => return Ok(Signal::Return(v)),
                        Signal::Normal => {}
                    }
                }
                Ok(Signal::Normal)
            }
            Stmt::Return { value, .. } => {
                let v = match value {
                    Some(e) => self.evaluate_expr(e, None)?,
                    None => Value::Null,
                };
                Ok(Signal::Return(v))
            }
            Stmt::Break { .. } => Ok(Signal::Break),
            Stmt::Global { span, .. } => {
                Err(runtime_err("'global' declarations are only valid at the top level", *span))
            }
            Stmt::FuncDecl(fd) => {
                Err(runtime_err("'func' declarations are only valid at the top level", fd.span))
            }
            Stmt::StructDecl(sd) => {
                Err(runtime_err("'struct' declarations are only valid at the top level", sd.span))
            }
            Stmt::Use(u) => Err(runtime_err("'use' is only valid at the top level", u.span)),
        }
    }

    // ---- l-values --------------------------------------------------------

    fn lvalue_type(&self, expr: &Expr) -> Result<Type, NoxyError> {
        match expr {
            Expr::Ident { name, span } => self
                .locals
                .lookup(name)
                .or_else(|| self.globals.get(name))
                .map(|(t, _)| t.clone())
                .ok_or_else(|| runtime_err(format!("undefined variable '{name}'"), *span)),
            Expr::Field { target, name, span } => {
                let tt = self.lvalue_type(target)?;
                let struct_name = match &tt {
                    Type::Struct(n) => n.clone(),
                    Type::Ref(inner) => match &**inner {
                        Type::Struct(n) => n.clone(),
                        _ => return Err(runtime_err("field access on a non-struct reference", *span)),
                    },
                    _ => return Err(runtime_err("field access on a non-struct value", *span)),
                };
                self.registry.structs[&struct_name]
                    .field_type(name)
                    .cloned()
                    .ok_or_else(|| runtime_err(format!("struct '{struct_name}' has no field '{name}'"), *span))
            }
            Expr::Index { target, span, .. } => match self.lvalue_type(target)? {
                Type::FixedArray(elem, _) | Type::DynamicArray(elem) => Ok(*elem),
                Type::Map(_, value) => Ok(*value),
                Type::String => Ok(Type::String),
                _ => Err(runtime_err("indexing a non-indexable value", *span)),
            },
            other => Err(runtime_err("invalid assignment target", other.span())),
        }
    }

    fn assign_lvalue(&mut self, target: &Expr, value: Value, span: Span) -> Result<(), NoxyError> {
        match target {
            Expr::Ident { name, .. } => {
                if let Some(slot) = self.locals.lookup_mut(name) {
                    slot.1 = value;
                } else if let Some(slot) = self.globals.get_mut(name) {
                    slot.1 = value;
                } else {
                    return Err(runtime_err(format!("undefined variable '{name}'"), span));
                }
                Ok(())
            }
            Expr::Field { target, name, span: fspan } => {
                let target_val = self.evaluate_expr(target, None)?;
                let handle = struct_handle(&target_val, *fspan)?;
                match self.heap.get_mut(handle) {
                    HeapObject::Struct(s) => {
                        s.fields.insert(name.clone(), value);
                        Ok(())
                    }
                    other => Err(fault_err(
                        RuntimeFault::TypeMismatch(format!("expected a struct, found '{}'", other.type_name())),
                        *fspan,
                    )),
                }
            }
            Expr::Index { target, index, span: ispan } => {
                let target_val = self.evaluate_expr(target, None)?;
                let index_val = self.evaluate_expr(index, None)?;
                match target_val {
                    Value::Array(h) => {
                        let i = int_index(&index_val, *ispan)?;
                        match self.heap.get_mut(h) {
                            HeapObject::Array(items) => {
                                let len = items.len();
                                let slot = items.get_mut(i as usize).ok_or_else(|| {
                                    fault_err(RuntimeFault::IndexOutOfBounds { index: i, len }, *ispan)
                                })?;
                                *slot = value;
                                Ok(())
                            }
                            other => Err(fault_err(
                                RuntimeFault::TypeMismatch(format!("expected an array, found '{}'", other.type_name())),
                                *ispan,
                            )),
                        }
                    }
                    Value::Map(h) => {
                        match self.heap.get_mut(h) {
                            HeapObject::Map(m) => {
                                m.insert(index_val, value);
                                Ok(())
                            }
                            other => Err(fault_err(
                                RuntimeFault::TypeMismatch(format!("expected a map, found '{}'", other.type_name())),
                                *ispan,
                            )),
                        }
                    }
                    _ => Err(runtime_err("cannot index-assign this value", *ispan)),
                }
            }
            _ => Err(runtime_err("invalid assignment target", span)),
        }
    }

    // ---- copy-on-bind ------------------------------------------------------

    /// Applies spec §4.4.3's value-semantics rule: a struct- or
    /// container-typed binding deep-copies its source unless `declared` is
    /// `Ref(_)` (an explicit alias, produced only by `ref expr`). Function
    /// parameters additionally bypass this when `ParamInfo::by_ref` is set
    /// (see `call_user_function`), which is why this helper isn't consulted
    /// for by-ref container arguments.
    fn materialize(&mut self, declared: &Type, value: Value) -> Value {
        match (declared, &value) {
            (Type::Ref(_), _) => value,
            (Type::Struct(_), Value::Struct(h)) => Value::Struct(self.heap.deep_copy(*h, self.registry)),
            (Type::FixedArray(..) | Type::DynamicArray(_), Value::Array(h)) => {
                Value::Array(self.heap.deep_copy(*h, self.registry))
            }
            (Type::Map(..), Value::Map(h)) => Value::Map(self.heap.deep_copy(*h, self.registry)),
            _ => value,
        }
    }

    // ---- expressions ---------------------------------------------------

    fn lookup_value(&self, name: &str) -> Option<Value> {
        self.locals
            .lookup(name)
            .or_else(|| self.globals.get(name))
            .map(|(_, v)| v.clone())
    }

    fn evaluate_expr(&mut self, expr: &Expr, expected: Option<&Type>) -> Result<Value, NoxyError> {
        match expr {
            Expr::Int { value, .. } => Ok(Value::Int(*value)),
            Expr::Float { value, .. } => Ok(Value::Float(*value)),
            Expr::Str { value, .. } => Ok(Value::Str(value.clone())),
            Expr::Bool { value, .. } => Ok(Value::Bool(*value)),
            Expr::Null { .. } => Ok(Value::Null),
            Expr::FString { parts, .. } => self.evaluate_fstring(parts),
            Expr::Ident { name, span } => {
                self.lookup_value(name).ok_or_else(|| runtime_err(format!("undefined variable '{name}'"), *span))
            }
            Expr::Unary { op, expr: inner, span } => self.evaluate_unary(*op, inner, *span),
            Expr::Binary { op, left, right, span } => self.evaluate_binary(*op, left, right, *span),
            Expr::Field { target, name, span } => self.evaluate_field(target, name, *span),
            Expr::Index { target, index, span } => self.evaluate_index(target, index, *span),
            Expr::Call { callee, args, span } => self.evaluate_call(callee, args, *span),
            Expr::ArrayLiteral { elements, span } => self.evaluate_array_literal(elements, expected, *span),
            Expr::Zeros { count, span } => self.evaluate_zeros(count, expected, *span),
            Expr::Ref { target, .. } => self.evaluate_expr(target, expected),
        }
    }

    fn evaluate_unary(&mut self, op: UnaryOp, inner: &Expr, span: Span) -> Result<Value, NoxyError> {
        let v = self.evaluate_expr(inner, None)?;
        match (op, v) {
            (UnaryOp::Neg, Value::Int(n)) => Ok(Value::Int(-n)),
            (UnaryOp::Neg, Value::Float(f)) => Ok(Value::Float(-f)),
            (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
            _ => Err(runtime_err("invalid operand for unary operator", span)),
        }
    }

    fn evaluate_binary(&mut self, op: BinaryOp, left: &Expr, right: &Expr, span: Span) -> Result<Value, NoxyError> {
        use BinaryOp::*;
        if matches!(op, And | Or) {
            let l = self.evaluate_expr(left, Some(&Type::Bool))?.is_truthy();
            if op == And && !l {
                return Ok(Value::Bool(false));
            }
            if op == Or && l {
                return Ok(Value::Bool(true));
            }
            let r = self.evaluate_expr(right, Some(&Type::Bool))?.is_truthy();
            return Ok(Value::Bool(r));
        }

        let lv = self.evaluate_expr(left, None)?;
        let rv = self.evaluate_expr(right, None)?;
        match op {
            Add => match (lv, rv) {
                (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a + b)),
                (Value::Float(a), Value::Float(b)) => Ok(Value::Float(a + b)),
                (Value::Str(a), Value::Str(b)) => Ok(Value::Str(a + &b)),
                (a, b) => Err(type_mismatch_err(&a, &b, "+", span)),
            },
            Sub => arith(lv, rv, "-", span, |a, b| a - b, |a, b| a - b),
            Mul => arith(lv, rv, "*", span, |a, b| a * b, |a, b| a * b),
            Div => match (lv, rv) {
                (Value::Int(_), Value::Int(0)) => Err(fault_err(RuntimeFault::DivisionByZero, span)),
                (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a / b)),
                (Value::Float(a), Value::Float(b)) => {
                    if b == 0.0 {
                        Err(fault_err(RuntimeFault::DivisionByZero, span))
                    } else {
                        Ok(Value::Float(a / b))
                    }
                }
                (a, b) => Err(type_mismatch_err(&a, &b, "/", span)),
            },
            Mod => match (lv, rv) {
                (Value::Int(_), Value::Int(0)) => Err(fault_err(RuntimeFault::DivisionByZero, span)),
                (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a % b)),
                (Value::Float(a), Value::Float(b)) => Ok(Value::Float(a % b)),
                (a, b) => Err(type_mismatch_err(&a, &b, "%", span)),
            },
            Lt => compare(lv, rv, span, |o| o == std::cmp::Ordering::Less),
            Gt => compare(lv, rv, span, |o| o == std::cmp::Ordering::Greater),
            LtEq => compare(lv, rv, span, |o| o != std::cmp::Ordering::Greater),
            GtEq => compare(lv, rv, span, |o| o != std::cmp::Ordering::Less),
            EqEq => Ok(Value::Bool(values_equal(&lv, &rv, self.heap))),
            NotEq => Ok(Value::Bool(!values_equal(&lv, &rv, self.heap))),
            And | Or => unreachable!("handled above with short-circuiting"),
        }
    }

    /// Mirrors `Checker::namespace_qualified`: redirects `m.name` to the
    /// `"m.name"` keys the loader aliased a namespace's declarations under,
    /// when `target` is a bare identifier not bound as a local or global.
    fn namespace_qualified(&self, target: &Expr, name: &str) -> Option<String> {
        let Expr::Ident { name: target_name, .. } = target else { return None };
        if self.locals.lookup(target_name).is_some() || self.globals.contains_key(target_name) {
            return None;
        }
        if self.registry.namespaces.contains(target_name) {
            Some(format!("{target_name}.{name}"))
        } else {
            None
        }
    }

    fn evaluate_field(&mut self, target: &Expr, name: &str, span: Span) -> Result<Value, NoxyError> {
        if let Some(qualified) = self.namespace_qualified(target, name) {
            return self
                .globals
                .get(&qualified)
                .map(|(_, v)| v.clone())
                .ok_or_else(|| runtime_err(format!("namespace has no exported global '{name}'"), span));
        }
        let tv = self.evaluate_expr(target, None)?;
        let handle = struct_handle(&tv, span)?;
        match self.heap.get(handle) {
            HeapObject::Struct(s) => s
                .fields
                .get(name)
                .cloned()
                .ok_or_else(|| runtime_err(format!("struct has no field '{name}'"), span)),
            other => Err(fault_err(
                RuntimeFault::TypeMismatch(format!("expected a struct, found '{}'", other.type_name())),
                span,
            )),
        }
    }

    fn evaluate_index(&mut self, target: &Expr, index: &Expr, span: Span) -> Result<Value, NoxyError> {
        let tv = self.evaluate_expr(target, None)?;
        let iv = self.evaluate_expr(index, None)?;
        match tv {
            Value::Array(h) => {
                let i = int_index(&iv, span)?;
                match self.heap.get(h) {
                    HeapObject::Array(items) => items
                        .get(i as usize)
                        .cloned()
                        .ok_or_else(|| fault_err(RuntimeFault::IndexOutOfBounds { index: i, len: items.len() }, span)),
                    other => Err(fault_err(
                        RuntimeFault::TypeMismatch(format!("expected an array, found '{}'", other.type_name())),
                        span,
                    )),
                }
            }
            Value::Map(h) => match self.heap.get(h) {
                HeapObject::Map(m) => m.get(&iv).cloned().ok_or_else(|| fault_err(RuntimeFault::MapKeyMissing, span)),
                other => Err(fault_err(
                    RuntimeFault::TypeMismatch(format!("expected a map, found '{}'", other.type_name())),
                    span,
                )),
            },
            Value::Str(s) => {
                let i = int_index(&iv, span)?;
                s.chars()
                    .nth(i as usize)
                    .map(|c| Value::Str(c.to_string()))
                    .ok_or_else(|| fault_err(RuntimeFault::IndexOutOfBounds { index: i, len: s.chars().count() }, span))
            }
            _ => Err(runtime_err("cannot index this value", span)),
        }
    }

    fn evaluate_array_literal(
        &mut self,
        elements: &[Expr],
        expected: Option<&Type>,
        _span: Span,
    ) -> Result<Value, NoxyError> {
        let elem_ty = match expected {
            Some(Type::FixedArray(e, _)) | Some(Type::DynamicArray(e)) => Some((**e).clone()),
            _ => None,
        };
        let mut values = Vec::with_capacity(elements.len());
        for e in elements {
            let v = self.evaluate_expr(e, elem_ty.as_ref())?;
            let v = match &elem_ty {
                Some(t) => self.materialize(t, v),
                None => v,
            };
            values.push(v);
        }
        Ok(Value::Array(self.heap.alloc(HeapObject::Array(values))))
    }

    fn evaluate_zeros(&mut self, count: &Expr, expected: Option<&Type>, span: Span) -> Result<Value, NoxyError> {
        let n = int_index(&self.evaluate_expr(count, Some(&Type::Int))?, span)?;
        if n < 0 {
            return Err(runtime_err("'zeros' length must not be negative", span));
        }
        let elem_ty = match expected {
            Some(Type::FixedArray(e, declared_len)) => {
                if n as u32 != *declared_len {
                    return Err(runtime_err(
                        format!("'zeros' produced length {n}, expected {declared_len}"),
                        span,
                    ));
                }
                (**e).clone()
            }
            Some(Type::DynamicArray(e)) => (**e).clone(),
            _ => return Err(runtime_err("cannot infer the element type of 'zeros' here", span)),
        };
        let values = (0..n).map(|_| zero_value(&elem_ty, span)).collect::<Result<Vec<_>, _>>()?;
        Ok(Value::Array(self.heap.alloc(HeapObject::Array(values))))
    }

    fn evaluate_fstring(&mut self, parts: &[FStringPart]) -> Result<Value, NoxyError> {
        let mut out = String::new();
        for part in parts {
            match part {
                FStringPart::Literal(s) => out.push_str(s),
                FStringPart::Hole { expr, spec } => {
                    let v = self.evaluate_expr(expr, None)?;
                    out.push_str(&render_hole(&v, spec.as_ref(), self.heap));
                }
            }
        }
        Ok(Value::Str(out))
    }

    fn evaluate_call(&mut self, callee: &Expr, args: &[Expr], span: Span) -> Result<Value, NoxyError> {
        let qualified;
        let name: &String = match callee {
            Expr::Ident { name, .. } => name,
            Expr::Field { target, name: field_name, .. } => match self.namespace_qualified(target, field_name) {
                Some(q) => {
                    qualified = q;
                    &qualified
                }
                None => return Err(runtime_err("call target must be a name", span)),
            },
            _ => return Err(runtime_err("call target must be a name", span)),
        };

        if let Some(info) = self.registry.structs.get(name) {
            let fields = info.fields.clone();
            let mut instance_fields = HashMap::with_capacity(fields.len());
            let mut field_order = Vec::with_capacity(fields.len());
            for (arg, (fname, fty)) in args.iter().zip(fields.iter()) {
                let v = self.evaluate_expr(arg, Some(fty))?;
                let v = self.materialize(fty, v);
                instance_fields.insert(fname.clone(), v);
                field_order.push(fname.clone());
            }
            let handle = self.heap.alloc(HeapObject::Struct(StructInstance {
                type_name: name.clone(),
                fields: instance_fields,
                field_order,
            }));
            return Ok(Value::Struct(handle));
        }

        if self.registry.functions.contains_key(name) {
            return self.call_user_function(name, args, span);
        }

        if builtins::is_builtin(name) {
            let mut values = Vec::with_capacity(args.len());
            for a in args {
                values.push(self.evaluate_expr(a, None)?);
            }
            return builtins::call(name, values, self.heap, self.output).map_err(|f| fault_err(f, span));
        }

        Err(runtime_err(format!("undefined function '{name}'"), span))
    }

    fn call_user_function(&mut self, name: &str, args: &[Expr], span: Span) -> Result<Value, NoxyError> {
        if self.call_depth >= MAX_CALL_DEPTH {
            return Err(runtime_err("stack overflow: call depth exceeded", span));
        }
        self.call_depth += 1;
        let result = self.call_user_function_inner(name, args);
        self.call_depth -= 1;
        result
    }

    fn call_user_function_inner(&mut self, name: &str, args: &[Expr]) -> Result<Value, NoxyError> {
        let sig: FunctionInfo = self.registry.functions[name].clone();
        let fd = self.functions[name].clone();

        let mut bound = Vec::with_capacity(args.len());
        for (arg, param) in args.iter().zip(sig.params.iter()) {
            let v = self.evaluate_expr(arg, Some(&param.ty))?;
            let v = if param.by_ref { v } else { self.materialize(&param.ty, v) };
            bound.push((param.name.clone(), (param.ty.clone(), v)));
        }

        let caller_locals = std::mem::replace(&mut self.locals, ScopeStack::with_root());
        for (name, slot) in bound {
            self.locals.bind(&name, slot);
        }

        let mut signal = Signal::Normal;
        for stmt in &fd.body.stmts {
            signal = self.execute_stmt(stmt)?;
            if !matches!(signal, Signal::Normal) {
                break;
            }
        }
        self.locals = caller_locals;

        let result = match signal {
            Signal::Return(v) => v,
            _ => Value::Null,
        };
        Ok(self.materialize(&sig.return_type, result))
    }
}

/// A human-readable "type mismatch" runtime error for a binary operator
/// applied to operand shapes the analyzer would reject — only reachable
/// with `--no-typecheck` (spec §6.1).
fn type_mismatch_err(l: &Value, r: &Value, op: &str, span: Span) -> NoxyError {
    fault_err(
        RuntimeFault::TypeMismatch(format!(
            "'{op}' does not accept '{}' and '{}'",
            l.type_name(),
            r.type_name()
        )),
        span,
    )
}

fn arith(
    l: Value,
    r: Value,
    op: &str,
    span: Span,
    fi: fn(i64, i64) -> i64,
    ff: fn(f64, f64) -> f64,
) -> Result<Value, NoxyError> {
    match (l, r) {
        (Value::Int(a), Value::Int(b)) => Ok(Value::Int(fi(a, b))),
        (Value::Float(a), Value::Float(b)) => Ok(Value::Float(ff(a, b))),
        (a, b) => Err(type_mismatch_err(&a, &b, op, span)),
    }
}

fn compare(l: Value, r: Value, span: Span, f: fn(std::cmp::Ordering) -> bool) -> Result<Value, NoxyError> {
    let ord = match (&l, &r) {
        (Value::Int(a), Value::Int(b)) => a.cmp(b),
        (Value::Float(a), Value::Float(b)) => a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal),
        _ => return Err(type_mismatch_err(&l, &r, "comparison", span)),
    };
    Ok(Value::Bool(f(ord)))
}

fn values_equal(a: &Value, b: &Value, heap: &Heap) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Null, Value::Struct(_)) | (Value::Struct(_), Value::Null) => false,
        (Value::Struct(ha), Value::Struct(hb)) => ha == hb,
        _ => a.render(heap) == b.render(heap) && std::mem::discriminant(a) == std::mem::discriminant(b),
    }
}

fn struct_handle(v: &Value, span: Span) -> Result<Handle, NoxyError> {
    match v {
        Value::Struct(h) => Ok(*h),
        Value::Null => Err(fault_err(RuntimeFault::NullReference, span)),
        other => Err(fault_err(
            RuntimeFault::TypeMismatch(format!("expected a struct, found '{}'", other.type_name())),
            span,
        )),
    }
}

fn int_index(v: &Value, span: Span) -> Result<i64, NoxyError> {
    match v {
        Value::Int(n) => Ok(*n),
        _ => Err(runtime_err("index must be an int", span)),
    }
}

fn zero_value(elem: &Type, span: Span) -> Result<Value, NoxyError> {
    Ok(match elem {
        Type::Int => Value::Int(0),
        Type::Float => Value::Float(0.0),
        Type::Bool => Value::Bool(false),
        Type::String => Value::Str(String::new()),
        other => {
            return Err(fault_err(
                RuntimeFault::TypeMismatch(format!("'zeros' cannot produce an element of type '{other}'")),
                span,
            ))
        }
    })
}

fn render_hole(v: &Value, spec: Option<&crate::ast::FormatSpec>, heap: &Heap) -> String {
    let Some(spec) = spec else {
        return v.render(heap);
    };
    let body = match (spec.ty, v) {
        (Some('x'), Value::Int(n)) => format!("{n:x}"),
        (Some('X'), Value::Int(n)) => format!("{n:X}"),
        (Some('o'), Value::Int(n)) => format!("{n:o}"),
        (Some('f'), Value::Float(f)) => format!("{:.*}", spec.precision.unwrap_or(6) as usize, f),
        (Some('e'), Value::Float(f)) => format!("{:.*e}", spec.precision.unwrap_or(6) as usize, f),
        (Some('g'), Value::Float(f)) => format!("{f}"),
        _ => v.render(heap),
    };
    match spec.width {
        Some(w) if (w as usize) > body.len() => {
            let pad = w as usize - body.len();
            if spec.zero_pad {
                format!("{}{}", "0".repeat(pad), body)
            } else {
                format!("{}{}", " ".repeat(pad), body)
            }
        }
        _ => body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::registry::build_registry;
    use crate::analysis::checker::check_program;
    use crate::parser::parse_program;

    fn run(src: &str) -> (Vec<String>, HashMap<String, (Type, Value)>) {
        let program = parse_program(src).unwrap();
        let registry = build_registry(&program).unwrap();
        let analysis = check_program(&program, registry).unwrap();
        let mut functions = HashMap::new();
        for stmt in &program {
            if let Stmt::FuncDecl(fd) = stmt {
                functions.insert(fd.name.clone(), Rc::new(fd.clone()));
            }
        }
        let mut heap = Heap::new();
        let mut output = Vec::new();
        let mut interp = Interpreter::new(&analysis.registry, &functions, &mut heap, &mut output);
        interp.run_top_level(&program).unwrap();
        let globals = interp.into_globals();
        (output, globals)
    }

    #[test]
    fn fibonacci_prints_expected_sequence() {
        let src = r#"
func fib(n:int)->int
    if n<2 then return n else return fib(n-1)+fib(n-2) end
end
print(to_str(fib(10)))
"#;
        let (out, _) = run(src);
        assert_eq!(out, vec!["55".to_string()]);
    }

    #[test]
    fn struct_by_value_does_not_alias() {
        let src = r#"
struct Counter n:int end
func incC(c:Counter)->void
    c.n = c.n + 1
end
let c: Counter = Counter(1)
incC(c)
print(to_str(c.n))
"#;
        let (out, _) = run(src);
        assert_eq!(out, vec!["1".to_string()]);
    }

    #[test]
    fn struct_by_ref_aliases() {
        let src = r#"
struct Counter n:int end
func incR(c: ref Counter)->void
    c.n = c.n + 1
end
let c: Counter = Counter(1)
incR(ref c)
print(to_str(c.n))
"#;
        let (out, _) = run(src);
        assert_eq!(out, vec!["2".to_string()]);
    }

    #[test]
    fn ref_container_parameter_mutates_the_caller_array() {
        let src = r#"
func fill(a: ref int[]) -> void
    append(a, 9)
end
let xs: int[] = [1, 2]
fill(xs)
print(to_str(length(xs)))
"#;
        let (out, _) = run(src);
        assert_eq!(out, vec!["3".to_string()]);
    }

    #[test]
    fn division_by_zero_is_a_runtime_error() {
        let src = "let x: int = 1 / 0";
        let program = parse_program(src).unwrap();
        let registry = build_registry(&program).unwrap();
        let analysis = check_program(&program, registry).unwrap();
        let functions = HashMap::new();
        let mut heap = Heap::new();
        let mut output = Vec::new();
        let mut interp = Interpreter::new(&analysis.registry, &functions, &mut heap, &mut output);
        assert!(interp.run_top_level(&program).is_err());
    }

    #[test]
    fn fstring_renders_hex_and_precision() {
        let src = r#"
let n: int = 42
let p: float = 3.14159
print(f"{n:05} {n:x} {p:.2f}")
"#;
        let (out, _) = run(src);
        assert_eq!(out, vec!["00042 2a 3.14".to_string()]);
    }
}
