//! Runtime values (spec §5) and the heap that gives struct and container
//! values identity.
//!
//! The teacher's `RuntimeValue` (in
//! `examples/Brahmastra-Labs-logicaffeine/src/interpreter.rs`) keeps struct
//! instances inline as a flat `HashMap<String, RuntimeValue>` with no
//! separate identity — fine for its proof-term values, which are never
//! mutated in place. Noxy needs real aliasing (`Ref(T)` handles, `ref`
//! container parameters) and cycle-tolerant structures (spec §9), so struct
//! and container payloads live in a [`Heap`] arena and a [`Value`] only ever
//! holds a [`Handle`] into it — the identity-bearing design spec §5
//! describes.

use std::collections::HashMap;
use std::fmt;

use crate::analysis::registry::Registry;
use crate::types::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(pub usize);

#[derive(Debug, Clone, PartialEq)]
pub struct StructInstance {
    pub type_name: String,
    pub fields: HashMap<String, Value>,
    /// Field names in declaration order — `to_str` renders `Name(f=v, …)`
    /// in that order (spec §6.3), which a `HashMap` alone can't give back.
    pub field_order: Vec<String>,
}

/// Maps store their entries as an assoc list rather than a `HashMap`
/// keyed by `Value`, since `Value` holds `f64` and has no total `Hash`/`Eq`.
/// Noxy maps are small in practice (spec's seed programs top out in the
/// tens of entries), so linear lookup is the right tradeoff over hand
/// rolling a hashable key wrapper.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapObject {
    pub entries: Vec<(Value, Value)>,
}

impl MapObject {
    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, key: &Value) -> Option<&mut Value> {
        self.entries.iter_mut().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn insert(&mut self, key: Value, value: Value) {
        if let Some(slot) = self.get_mut(&key) {
            *slot = value;
        } else {
            self.entries.push((key, value));
        }
    }

    pub fn remove(&mut self, key: &Value) -> Option<Value> {
        let idx = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(idx).1)
    }

    pub fn contains_key(&self, key: &Value) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum HeapObject {
    Array(Vec<Value>),
    Map(MapObject),
    Struct(StructInstance),
}

impl HeapObject {
    pub fn type_name(&self) -> &'static str {
        match self {
            HeapObject::Array(_) => "array",
            HeapObject::Map(_) => "map",
            HeapObject::Struct(_) => "struct",
        }
    }
}

/// Every heap-allocated value a program can produce, addressed by
/// [`Handle`]. An arena rather than per-value `Rc<RefCell<_>>`: handles stay
/// `Copy`, and the interpreter never needs to free anything mid-run (spec
/// §9 notes Noxy programs have no explicit deallocation — values live for
/// the process).
#[derive(Debug, Default)]
pub struct Heap {
    objects: Vec<HeapObject>,
}

impl Heap {
    pub fn new() -> Self {
        Heap { objects: Vec::new() }
    }

    pub fn alloc(&mut self, obj: HeapObject) -> Handle {
        self.objects.push(obj);
        Handle(self.objects.len() - 1)
    }

    pub fn get(&self, h: Handle) -> &HeapObject {
        &self.objects[h.0]
    }

    pub fn get_mut(&mut self, h: Handle) -> &mut HeapObject {
        &mut self.objects[h.0]
    }

    /// Allocates a structurally-independent copy of `h`'s object graph,
    /// recursing through nested arrays/maps/struct fields so that a
    /// deep-copied struct shares no handles with its source (spec §4.4.3).
    /// A `seen` map breaks cycles (spec §9): a handle already being copied
    /// in this call is resolved to the handle already allocated for it,
    /// rather than copied again.
    ///
    /// `registry` supplies each struct's declared field types so a
    /// `ref`-typed field copies its handle (shares the referenced instance)
    /// instead of being recursed into like a by-value field (spec §4.4.3
    /// point 2, "a struct containing a `ref` field is deep-copied at the
    /// struct layer but the referenced instance is shared").
    pub fn deep_copy(&mut self, h: Handle, registry: &Registry) -> Handle {
        let mut seen = HashMap::new();
        self.deep_copy_inner(h, registry, &mut seen)
    }

    fn deep_copy_inner(&mut self, h: Handle, registry: &Registry, seen: &mut HashMap<Handle, Handle>) -> Handle {
        if let Some(&existing) = seen.get(&h) {
            return existing;
        }
        // Reserve the new slot before recursing so cyclic references back
        // to `h` resolve through `seen` instead of recursing forever.
        let placeholder = self.alloc(HeapObject::Array(Vec::new()));
        seen.insert(h, placeholder);

        let copied = match self.get(h).clone() {
            HeapObject::Array(items) => HeapObject::Array(
                items
                    .into_iter()
                    .map(|v| self.deep_copy_value(v, registry, seen))
                    .collect(),
            ),
            HeapObject::Map(map) => HeapObject::Map(MapObject {
                entries: map
                    .entries
                    .into_iter()
                    .map(|(k, v)| {
                        (
                            self.deep_copy_value(k, registry, seen),
                            self.deep_copy_value(v, registry, seen),
                        )
                    })
                    .collect(),
            }),
            HeapObject::Struct(s) => {
                let info = registry.structs.get(&s.type_name);
                let fields = s
                    .fields
                    .into_iter()
                    .map(|(name, v)| {
                        let is_ref_field =
                            matches!(info.and_then(|i| i.field_type(&name)), Some(Type::Ref(_)));
                        let v = if is_ref_field {
                            // Copy the handle, not the target: the callee
                            // shares the caller's referenced instance.
                            v
                        } else {
                            self.deep_copy_value(v, registry, seen)
                        };
                        (name, v)
                    })
                    .collect();
                HeapObject::Struct(StructInstance {
                    type_name: s.type_name,
                    fields,
                    field_order: s.field_order,
                })
            }
        };
        *self.get_mut(placeholder) = copied;
        placeholder
    }

    fn deep_copy_value(&mut self, v: Value, registry: &Registry, seen: &mut HashMap<Handle, Handle>) -> Value {
        match v {
            Value::Array(h) => Value::Array(self.deep_copy_inner(h, registry, seen)),
            Value::Map(h) => Value::Map(self.deep_copy_inner(h, registry, seen)),
            Value::Struct(h) => Value::Struct(self.deep_copy_inner(h, registry, seen)),
            other => other,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Null,
    Array(Handle),
    Map(Handle),
    Struct(Handle),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Bool(_) => "bool",
            Value::Null => "null",
            Value::Array(_) => "array",
            Value::Map(_) => "map",
            Value::Struct(_) => "struct",
        }
    }

    pub fn is_truthy(&self) -> bool {
        matches!(self, Value::Bool(true))
    }

    /// Canonical `to_str` rendering (spec §6.3): `Int` decimal, `Float`
    /// with six decimals, `Bool` as `true`/`false`, `String` verbatim,
    /// array as `[e1, e2, …]`, struct as `TypeName(f1=v1, …)` in
    /// declaration order. Used by `print`/`to_str` and by bare (unspec'd)
    /// f-string holes. Needs the heap to walk into containers and structs.
    pub fn render(&self, heap: &Heap) -> String {
        match self {
            Value::Int(n) => n.to_string(),
            Value::Float(f) => format!("{f:.6}"),
            Value::Str(s) => s.clone(),
            Value::Bool(b) => b.to_string(),
            Value::Null => "null".to_string(),
            Value::Array(h) => match heap.get(*h) {
                HeapObject::Array(items) => {
                    let parts: Vec<String> = items.iter().map(|v| v.render(heap)).collect();
                    format!("[{}]", parts.join(", "))
                }
                _ => unreachable!("Array handle must point to an Array object"),
            },
            Value::Map(h) => match heap.get(*h) {
                HeapObject::Map(map) => {
                    let parts: Vec<String> = map
                        .entries
                        .iter()
                        .map(|(k, v)| format!("{}: {}", k.render(heap), v.render(heap)))
                        .collect();
                    format!("{{{}}}", parts.join(", "))
                }
                _ => unreachable!("Map handle must point to a Map object"),
            },
            Value::Struct(h) => match heap.get(*h) {
                HeapObject::Struct(s) => {
                    let parts: Vec<String> = s
                        .field_order
                        .iter()
                        .map(|n| format!("{}={}", n, s.fields[n].render(heap)))
                        .collect();
                    format!("{}({})", s.type_name, parts.join(", "))
                }
                _ => unreachable!("Struct handle must point to a Struct object"),
            },
        }
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::registry::StructInfo;

    /// A registry with one struct `Node { valor: int, next: ref Node }`,
    /// matching the only shape a real cycle can take (spec §4.3: a struct
    /// may only self-reference through a `ref` field).
    fn node_registry() -> Registry {
        let mut registry = Registry::default();
        registry.structs.insert(
            "Node".to_string(),
            StructInfo {
                fields: vec![
                    ("valor".to_string(), Type::Int),
                    ("next".to_string(), Type::Ref(Box::new(Type::Struct("Node".to_string())))),
                ],
            },
        );
        registry
    }

    #[test]
    fn deep_copy_array_is_independent() {
        let mut heap = Heap::new();
        let registry = Registry::default();
        let inner = heap.alloc(HeapObject::Array(vec![Value::Int(1), Value::Int(2)]));
        let copy = heap.deep_copy(inner, &registry);
        assert_ne!(inner, copy);
        if let HeapObject::Array(items) = heap.get_mut(inner) {
            items.push(Value::Int(3));
        }
        match heap.get(copy) {
            HeapObject::Array(items) => assert_eq!(items.len(), 2),
            _ => panic!("expected array"),
        }
    }

    #[test]
    fn deep_copy_of_ref_field_shares_the_target_instance() {
        let mut heap = Heap::new();
        let registry = node_registry();
        let target = heap.alloc(HeapObject::Struct(StructInstance {
            type_name: "Node".into(),
            fields: HashMap::from([("valor".to_string(), Value::Int(1))]),
            field_order: vec!["valor".to_string()],
        }));
        let holder = heap.alloc(HeapObject::Struct(StructInstance {
            type_name: "Node".into(),
            fields: HashMap::from([
                ("valor".to_string(), Value::Int(0)),
                ("next".to_string(), Value::Struct(target)),
            ]),
            field_order: vec!["valor".to_string(), "next".to_string()],
        }));

        let copy = heap.deep_copy(holder, &registry);
        assert_ne!(copy, holder);
        match heap.get(copy) {
            HeapObject::Struct(s) => assert_eq!(s.fields["next"], Value::Struct(target)),
            _ => panic!("expected struct"),
        }

        // Mutating the shared target through the original is visible from
        // the copy's `next` field, since both point at the same instance.
        if let HeapObject::Struct(s) = heap.get_mut(target) {
            s.fields.insert("valor".to_string(), Value::Int(99));
        }
        match heap.get(copy) {
            HeapObject::Struct(s) => match s.fields["next"] {
                Value::Struct(h) => match heap.get(h) {
                    HeapObject::Struct(t) => assert_eq!(t.fields["valor"], Value::Int(99)),
                    _ => panic!("expected struct"),
                },
                _ => panic!("expected struct value"),
            },
            _ => panic!("expected struct"),
        }
    }

    #[test]
    fn deep_copy_breaks_cycles() {
        // A struct can only self-reference through a `ref` field (enforced
        // at registry build time), and a `ref` field now shares its target
        // rather than recursing into it — so the only way to build a true
        // cyclic object graph is through a by-value container, e.g. an
        // array that holds a handle back to itself.
        let mut heap = Heap::new();
        let registry = Registry::default();
        let array = heap.alloc(HeapObject::Array(Vec::new()));
        if let HeapObject::Array(items) = heap.get_mut(array) {
            items.push(Value::Array(array));
        }
        let copy = heap.deep_copy(array, &registry);
        assert_ne!(copy, array);
        match heap.get(copy) {
            HeapObject::Array(items) => assert_eq!(items[0], Value::Array(copy)),
            _ => panic!("expected array"),
        }
    }

    #[test]
    fn map_object_insert_overwrites_existing_key() {
        let mut m = MapObject::default();
        m.insert(Value::Str("a".into()), Value::Int(1));
        m.insert(Value::Str("a".into()), Value::Int(2));
        assert_eq!(m.entries.len(), 1);
        assert_eq!(m.get(&Value::Str("a".into())), Some(&Value::Int(2)));
    }
}
