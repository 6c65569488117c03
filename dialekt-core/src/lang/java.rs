//! Object-message dialect: single-rooted class hierarchies with dynamic
//! "class of a live object" resolution and bracketed message sends.
//!
//! Objects are referenced through pointers; the first word of an object
//! is the address of its class descriptor. A descriptor holds the
//! address of the class's mangled name and the descriptor of its
//! superclass. A small set of primitive descriptors is encoded with
//! out-of-range sentinel addresses instead of heap storage. Resolved
//! classes are memoized in a process-wide synthetic symbol table keyed
//! by mangled name, so repeated lookups are O(1).

use std::sync::{Mutex, OnceLock};

use log::debug;
use rustc_hash::FxHashMap;

use crate::expr::ast::{BinaryOpcode, UnaryOpcode};
use crate::expr::error::EvalError;
use crate::expr::eval::Evaluator;
use crate::expr::token::Kw;
use crate::lang::{c, Dialect, DialectKind};
use crate::provider::Provider;
use crate::types::Type;
use crate::value::Value;

pub struct JavaDialect;

/// Descriptor addresses at or above this base denote primitive types.
pub const PRIMITIVE_SENTINEL_BASE: u64 = 0xffff_ffff_ffff_ff00;

/// Primitive types in sentinel order.
const PRIMITIVES: &[(&str, fn() -> Type)] = &[
    ("int", Type::int),
    ("boolean", || Type::Bool),
    ("byte", Type::signed_char),
    ("char", Type::char),
    ("short", Type::short),
    ("long", Type::long),
    ("float", Type::float),
    ("double", Type::double),
    ("void", || Type::Void),
];

fn read_word(provider: &dyn Provider, addr: u64) -> Result<u64, EvalError> {
    let bytes = provider.read_memory(addr, 8)?;
    let arr: [u8; 8] = bytes
        .try_into()
        .map_err(|_| EvalError::Internal("short descriptor read".into()))?;
    Ok(u64::from_le_bytes(arr))
}

fn class_memo() -> &'static Mutex<FxHashMap<String, Type>> {
    static MEMO: OnceLock<Mutex<FxHashMap<String, Type>>> = OnceLock::new();
    MEMO.get_or_init(|| Mutex::new(FxHashMap::default()))
}

/// Resolve a class descriptor address to a type, consulting and filling
/// the memo table.
pub fn resolve_class(provider: &dyn Provider, desc: u64) -> Result<Type, EvalError> {
    if desc >= PRIMITIVE_SENTINEL_BASE {
        let index = (desc - PRIMITIVE_SENTINEL_BASE) as usize;
        return PRIMITIVES
            .get(index)
            .map(|(_, make)| make())
            .ok_or(EvalError::Internal(format!(
                "bad primitive class sentinel {:#x}",
                desc
            )));
    }

    let name_ptr = read_word(provider, desc)?;
    let mangled = provider.read_c_string(name_ptr, 512)?;

    if let Some(ty) = class_memo().lock().unwrap().get(&mangled) {
        return Ok(ty.clone());
    }

    debug!("resolving class descriptor {:#x} -> {}", desc, mangled);

    let super_desc = read_word(provider, desc + 8)?;

    // Prefer the symtab's own layout for the class; fall back to an
    // opaque shell so the name at least prints.
    let mut ty = match provider.lookup_type(&mangled, None) {
        Some(t) => t,
        None => Type::Struct {
            name: mangled.clone(),
            fields: Vec::new(),
            superclass: None,
            size: 0,
        },
    };
    if super_desc != 0 {
        let super_ty = resolve_class(provider, super_desc)?;
        if let (
            Type::Struct { superclass, .. },
            Type::Struct {
                name: super_name, ..
            },
        ) = (&mut ty, &super_ty)
        {
            if superclass.is_none() {
                *superclass = Some(super_name.clone());
            }
        }
    }

    class_memo()
        .lock()
        .unwrap()
        .insert(mangled, ty.clone());
    Ok(ty)
}

impl JavaDialect {
    /// Most-derived type of an object reference, from its descriptor.
    fn object_class(
        &self,
        ev: &Evaluator<'_>,
        v: &Value,
    ) -> Result<Option<(u64, Type)>, EvalError> {
        let ty = v.ty().unreferenced();
        let is_object_ref = match ty.unqualified() {
            Type::Pointer { target } => target.is_struct(),
            _ => false,
        };
        if !is_object_ref || ev.side_effect_free() {
            return Ok(None);
        }
        let obj = v.as_int().ok_or(EvalError::NotArithmetic)? as u64;
        if obj == 0 {
            return Ok(None);
        }
        let desc = read_word(ev.provider(), obj)?;
        let class = resolve_class(ev.provider(), desc)?;
        Ok(Some((obj, class)))
    }
}

impl Dialect for JavaDialect {
    fn kind(&self) -> DialectKind {
        DialectKind::Java
    }

    fn name(&self) -> &'static str {
        "java"
    }

    fn has_scope_operator(&self) -> bool {
        false
    }

    fn has_message_send(&self) -> bool {
        true
    }

    fn self_name(&self) -> Option<&'static str> {
        Some("self")
    }

    fn keyword(&self, text: &str) -> Option<(Kw, bool)> {
        match text {
            "this" | "self" => Some((Kw::This, true)),
            "true" => Some((Kw::True, true)),
            "false" => Some((Kw::False, true)),
            "sizeof" => Some((Kw::Sizeof, true)),
            _ => None,
        }
    }

    fn eval_binary(
        &self,
        ev: &Evaluator<'_>,
        op: BinaryOpcode,
        lhs: &Value,
        rhs: &Value,
    ) -> Result<Value, EvalError> {
        c::binary_scalar(ev, op, lhs, rhs)
    }

    fn eval_unary(
        &self,
        ev: &Evaluator<'_>,
        op: UnaryOpcode,
        operand: &Value,
    ) -> Result<Value, EvalError> {
        c::unary_scalar(ev, op, operand)
    }

    fn eval_cast(&self, ev: &Evaluator<'_>, to: &Type, v: &Value) -> Result<Value, EvalError> {
        c::cast_scalar(ev, to, v)
    }

    /// Field access goes through the object's dynamic class, so a field
    /// introduced by the most-derived class is visible even when the
    /// static type is a base reference.
    fn eval_field(
        &self,
        ev: &Evaluator<'_>,
        base: &Value,
        field: &str,
    ) -> Result<Value, EvalError> {
        if let Some((obj, class)) = self.object_class(ev, base)? {
            let object = Value::read(ev.provider(), class, obj)?;
            return c::field_scalar(ev, &object, field);
        }
        let ty = base.ty().unreferenced();
        if ty.is_pointer() {
            let object = c::deref(ev, base)?;
            return c::field_scalar(ev, &object, field);
        }
        c::field_scalar(ev, base, field)
    }

    fn truthy(&self, _ev: &Evaluator<'_>, v: &Value) -> Result<bool, EvalError> {
        c::truthy_scalar(v)
    }

    fn dynamic_type(&self, ev: &Evaluator<'_>, v: &Value) -> Result<Option<Type>, EvalError> {
        Ok(self
            .object_class(ev, v)?
            .map(|(_, class)| Type::pointer(class)))
    }

    /// Method lookup walks the dynamic class chain; actually invoking a
    /// method would require calling into the target, which this core
    /// does not do. In side-effect-free mode the result is typed by the
    /// method's return type.
    fn eval_message(
        &self,
        ev: &Evaluator<'_>,
        receiver: &Value,
        selector: &[String],
        _args: &[Value],
    ) -> Result<Value, EvalError> {
        let sel = selector.join(":");
        let class = match self.object_class(ev, receiver)? {
            Some((_, class)) => class,
            None => match receiver.ty().unreferenced().unqualified() {
                Type::Pointer { target } if target.is_struct() => (**target).clone(),
                other => other.clone(),
            },
        };

        // find the method as a function-typed member
        let mut cur = class;
        let method = loop {
            if let Some(f) = cur.field(&sel) {
                break Some(f.ty.clone());
            }
            let superclass = match cur.unqualified() {
                Type::Struct {
                    superclass: Some(s),
                    ..
                } => s.clone(),
                _ => break None,
            };
            match ev.provider().lookup_type(&superclass, None) {
                Some(next) => cur = next,
                None => break None,
            }
        };

        let method = method.ok_or_else(|| {
            EvalError::no_such_field(sel.clone(), receiver.ty().display_name())
        })?;
        if !ev.side_effect_free() {
            return Err(EvalError::not_supported(
                "invoking methods in the target",
            ));
        }
        match method.unqualified() {
            Type::Function { ret, .. } => Ok(c::zero_of(ret)),
            other => Ok(c::zero_of(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::StaticProvider;

    #[test]
    fn primitive_sentinels_resolve_without_memory() {
        let p = StaticProvider::new(0x1000, 8);
        let ty = resolve_class(&p, PRIMITIVE_SENTINEL_BASE).unwrap();
        assert_eq!(ty, Type::int());
        let ty = resolve_class(&p, PRIMITIVE_SENTINEL_BASE + 1).unwrap();
        assert_eq!(ty, Type::Bool);
        assert!(resolve_class(&p, PRIMITIVE_SENTINEL_BASE + 64).is_err());
    }

    #[test]
    fn heap_descriptor_resolves_and_memoizes() {
        let mut p = StaticProvider::new(0x1000, 0x100);
        // descriptor at 0x1000: name ptr 0x1020, superclass 0
        p.poke(0x1000, &0x1020u64.to_le_bytes());
        p.poke(0x1008, &0u64.to_le_bytes());
        p.poke(0x1020, b"Widget\0");
        p.define_type(
            "Widget",
            Type::Struct {
                name: "Widget".into(),
                fields: vec![],
                superclass: None,
                size: 16,
            },
        );
        let ty = resolve_class(&p, 0x1000).unwrap();
        assert_eq!(ty.display_name(), "Widget");
        let again = resolve_class(&p, 0x1000).unwrap();
        assert_eq!(ty, again);
        assert!(class_memo().lock().unwrap().contains_key("Widget"));
    }
}
