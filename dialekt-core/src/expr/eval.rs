//! Language-dispatch evaluator.
//!
//! Walks an operation tree in post-order and computes values, consulting
//! the provider for every leaf that denotes live program state. All
//! operator semantics go through the active [`Dialect`]; the only
//! exceptions handled here are the short-circuit forms (`&&`, `||`,
//! `?:`, comma), which must not evaluate unselected subtrees.

use log::debug;

use crate::expr::ast::{BinaryOpcode, Operation, SizeArg};
use crate::expr::error::EvalError;
use crate::lang::{c, Dialect, DialectKind};
use crate::provider::{BlockId, Provider, Symbol, SymbolDomain, SymbolKind};
use crate::types::Type;
use crate::value::{decode_escapes, Contents, Location, Value};

/// Evaluation mode. `SideEffectFree` types expressions without firing
/// side effects: no target writes, no function calls, and memory reads
/// are replaced by typed zeros.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalMode {
    Normal,
    SideEffectFree,
}

/// One evaluation pass. Owns no global state; safe to create one per
/// thread against the same immutable dialect descriptors.
pub struct Evaluator<'a> {
    provider: &'a dyn Provider,
    dialect: &'static dyn Dialect,
    mode: EvalMode,
    scope: Option<BlockId>,
}

impl<'a> Evaluator<'a> {
    pub fn new(provider: &'a dyn Provider, dialect: DialectKind) -> Evaluator<'a> {
        Evaluator {
            provider,
            dialect: dialect.dialect(),
            mode: EvalMode::Normal,
            scope: None,
        }
    }

    pub fn with_mode(mut self, mode: EvalMode) -> Evaluator<'a> {
        self.mode = mode;
        self
    }

    pub fn with_scope(mut self, scope: Option<BlockId>) -> Evaluator<'a> {
        self.scope = scope;
        self
    }

    pub fn provider(&self) -> &'a dyn Provider {
        self.provider
    }

    pub fn dialect(&self) -> &'static dyn Dialect {
        self.dialect
    }

    pub fn side_effect_free(&self) -> bool {
        self.mode == EvalMode::SideEffectFree
    }

    fn quiet(&self) -> Evaluator<'a> {
        Evaluator {
            provider: self.provider,
            dialect: self.dialect,
            mode: EvalMode::SideEffectFree,
            scope: self.scope,
        }
    }

    pub fn evaluate(&self, op: &Operation) -> Result<Value, EvalError> {
        match op {
            Operation::IntLiteral { ty, value } => Ok(Value::from_int(ty.clone(), *value)),
            Operation::FloatLiteral { ty, value } => Ok(Value::from_float(ty.clone(), *value)),
            Operation::ComplexLiteral { ty, re, im } => {
                Ok(Value::from_complex(ty.clone(), *re, *im))
            }
            Operation::BoolLiteral { value } => Ok(Value::from_bool(*value)),
            Operation::CharLiteral { encoding, value } => Ok(Value::from_int(
                Type::Char {
                    encoding: *encoding,
                },
                *value,
            )),
            Operation::StringLiteral { encoding, bytes } => {
                let decoded = decode_escapes(bytes, *encoding);
                let units = decoded.len() as u64 / encoding.unit_size().max(1) + 1;
                Ok(Value::from_bytes(
                    Type::array(
                        Type::Char {
                            encoding: *encoding,
                        },
                        Some(units),
                    ),
                    decoded,
                ))
            }

            Operation::Unary { op, operand } => {
                let v = self.evaluate(operand)?;
                self.dialect.eval_unary(self, *op, &v)
            }
            Operation::Binary { op, left, right } => self.eval_binary(*op, left, right),
            Operation::Ternary {
                cond,
                then,
                otherwise,
            } => self.eval_ternary(cond, then, otherwise),
            Operation::Comma { left, right } => {
                let _ = self.evaluate(left)?;
                self.evaluate(right)
            }
            Operation::Assign { target, value } => self.eval_assign(target, value, None),
            Operation::AssignModify { op, target, value } => {
                self.eval_assign(target, value, Some(*op))
            }

            Operation::Cast { ty, operand, .. } => {
                let v = self.evaluate(operand)?;
                self.dialect.eval_cast(self, ty, &v)
            }
            Operation::CastDerived {
                type_source,
                operand,
                ..
            } => {
                let tv = self.quiet().evaluate(type_source)?;
                let v = self.evaluate(operand)?;
                self.dialect.eval_cast(self, tv.ty(), &v)
            }
            Operation::MemVal { ty, operand } => {
                let v = self.evaluate(operand)?;
                let addr = v.as_int().ok_or(EvalError::NotArithmetic)? as u64;
                if self.side_effect_free() {
                    Ok(c::zero_of(ty).with_location(Location::Memory(addr)))
                } else {
                    Value::read(self.provider, ty.clone(), addr)
                }
            }

            Operation::SizeOf { arg } => {
                let ty = self.size_arg_type(arg)?;
                Ok(Value::from_int(Type::unsigned_long(), ty.size_of() as i128))
            }
            Operation::AlignOf { arg } => {
                let ty = self.size_arg_type(arg)?;
                Ok(Value::from_int(
                    Type::unsigned_long(),
                    ty.align_of() as i128,
                ))
            }

            Operation::Subscript { base, index } => {
                let b = self.evaluate(base)?;
                let i = self.evaluate(index)?;
                self.eval_subscript(&b, &i)
            }
            Operation::FieldAccess {
                base,
                field,
                through_pointer,
            } => {
                let mut b = self.evaluate(base)?;
                if *through_pointer {
                    b = c::deref(self, &b)?;
                }
                self.dialect.eval_field(self, &b, field)
            }
            Operation::ScopeAccess { ty, member } => self.eval_scope_access(ty, member),

            Operation::Call { callee, args } => self.eval_call(callee, args),
            Operation::ArrayLiteral { elements } => self.eval_array_literal(elements),

            Operation::Variable { symbol } => self.eval_symbol(symbol),
            Operation::NamedVariable { name } => self.eval_named(name),
            Operation::SelfRef => self.eval_self(),
            Operation::TypeLiteral { ty } => Ok(Value::of_type(ty.clone())),
            Operation::TypeInstance { ty, .. } => Ok(Value::of_type(ty.clone())),

            Operation::MessageSend {
                receiver,
                selector,
                args,
            } => {
                let recv = self.evaluate(receiver)?;
                let mut argv = Vec::with_capacity(args.len());
                for a in args {
                    argv.push(self.evaluate(a)?);
                }
                self.dialect.eval_message(self, &recv, selector, &argv)
            }
        }
    }

    fn eval_binary(
        &self,
        op: BinaryOpcode,
        left: &Operation,
        right: &Operation,
    ) -> Result<Value, EvalError> {
        let short = matches!(op, BinaryOpcode::LogicalAnd | BinaryOpcode::LogicalOr)
            && self.dialect.short_circuits();
        if short && !self.side_effect_free() {
            let l = self.evaluate(left)?;
            let lt = self.dialect.truthy(self, &l)?;
            let decided = match op {
                BinaryOpcode::LogicalAnd => !lt,
                _ => lt,
            };
            if decided {
                return Ok(self.dialect.logical_result(lt));
            }
            let r = self.evaluate(right)?;
            let rt = self.dialect.truthy(self, &r)?;
            return Ok(self.dialect.logical_result(rt));
        }
        debug!("dispatching {:?} through {}", op, self.dialect.name());
        let l = self.evaluate(left)?;
        let r = self.evaluate(right)?;
        self.dialect.eval_binary(self, op, &l, &r)
    }

    fn eval_ternary(
        &self,
        cond: &Operation,
        then: &Operation,
        otherwise: &Operation,
    ) -> Result<Value, EvalError> {
        if self.side_effect_free() {
            // type both branches without firing effects
            let t = self.evaluate(then)?;
            let _ = self.evaluate(otherwise)?;
            let _ = self.evaluate(cond)?;
            return Ok(t);
        }
        let c = self.evaluate(cond)?;
        if self.dialect.truthy(self, &c)? {
            self.evaluate(then)
        } else {
            self.evaluate(otherwise)
        }
    }

    fn eval_assign(
        &self,
        target: &Operation,
        value: &Operation,
        modify: Option<BinaryOpcode>,
    ) -> Result<Value, EvalError> {
        let t = self.evaluate(target)?;
        let v = self.evaluate(value)?;
        let stored = match modify {
            Some(op) => self.dialect.eval_binary(self, op, &t, &v)?,
            None => v,
        };
        if !t.is_lvalue() {
            return Err(EvalError::NotAnLvalue);
        }
        if !self.side_effect_free() {
            t.assign(self.provider, &stored)?;
        }
        // the result has the target's type
        self.dialect.eval_cast(self, t.ty(), &stored)
    }

    fn size_arg_type(&self, arg: &SizeArg) -> Result<Type, EvalError> {
        match arg {
            SizeArg::Type(ty) => Ok(ty.clone()),
            SizeArg::Expr(e) => {
                let v = self.quiet().evaluate(e)?;
                Ok(v.ty().unreferenced().clone())
            }
        }
    }

    fn eval_subscript(&self, base: &Value, index: &Value) -> Result<Value, EvalError> {
        let i = index.as_int().ok_or(EvalError::NotArithmetic)?;
        let ty = base.ty().unreferenced().unqualified().clone();
        match &ty {
            Type::Vector { element, lanes } => {
                if i < 0 || i >= i128::from(*lanes) {
                    return Err(EvalError::VectorBounds {
                        type_name: ty.display_name(),
                    });
                }
                let lanes_data = base.lanes().ok_or_else(|| EvalError::VectorBounds {
                    type_name: ty.display_name(),
                })?;
                let mut v = Value::new((**element).clone(), Contents::Scalar(lanes_data[i as usize]));
                if base.is_lvalue() {
                    v = v.with_location(Location::Swizzle {
                        parent: Box::new(base.clone()),
                        lanes: vec![i as u32],
                    });
                }
                Ok(v)
            }
            Type::Array { element, .. } => {
                if let Some(addr) = base.address() {
                    let target = addr as i128 + i * element.size_of() as i128;
                    if self.side_effect_free() {
                        return Ok(c::zero_of(element)
                            .with_location(Location::Memory(target as u64)));
                    }
                    return Value::read(self.provider, (**element).clone(), target as u64);
                }
                if let Contents::Bytes(bytes) = base.contents() {
                    let sz = element.size_of() as usize;
                    let start = i as usize * sz;
                    if start + sz > bytes.len() {
                        return Err(EvalError::MemoryAccess {
                            address: start as u64,
                        });
                    }
                    let contents = crate::value::decode(element, &bytes[start..start + sz])?;
                    return Ok(Value::new((**element).clone(), contents));
                }
                Err(EvalError::NotSubscriptable {
                    type_name: ty.display_name(),
                })
            }
            Type::Pointer { target } => {
                let p = base.as_int().ok_or(EvalError::NotArithmetic)?;
                let addr = p + i * target.size_of() as i128;
                if self.side_effect_free() {
                    return Ok(c::zero_of(target).with_location(Location::Memory(addr as u64)));
                }
                Value::read(self.provider, (**target).clone(), addr as u64)
            }
            _ => Err(EvalError::NotSubscriptable {
                type_name: ty.display_name(),
            }),
        }
    }

    fn eval_scope_access(&self, ty: &Type, member: &str) -> Result<Value, EvalError> {
        let qualified = format!("{}::{}", ty.display_name(), member);
        let lookup = self
            .provider
            .lookup_symbol(&qualified, self.scope, SymbolDomain::Var);
        match lookup.symbol {
            Some(sym) => self.eval_symbol(&sym),
            None => Err(EvalError::unknown_symbol(qualified)),
        }
    }

    fn eval_call(&self, callee: &Operation, args: &[Operation]) -> Result<Value, EvalError> {
        // arguments evaluate first even when the call itself cannot run
        for a in args {
            let _ = self.evaluate(a)?;
        }
        let f = self.quiet().evaluate(callee)?;
        let fty = f.ty().unreferenced().unqualified().clone();
        let ret = match &fty {
            Type::Function { ret, .. } => (**ret).clone(),
            Type::Pointer { target } => match target.unqualified() {
                Type::Function { ret, .. } => (**ret).clone(),
                _ => {
                    return Err(EvalError::not_supported(format!(
                        "calling a value of type {}",
                        fty.display_name()
                    )))
                }
            },
            _ => {
                return Err(EvalError::not_supported(format!(
                    "calling a value of type {}",
                    fty.display_name()
                )))
            }
        };
        if self.side_effect_free() {
            return Ok(c::zero_of(&ret));
        }
        Err(EvalError::not_supported(
            "calling functions in the target",
        ))
    }

    fn eval_array_literal(&self, elements: &[Operation]) -> Result<Value, EvalError> {
        if elements.is_empty() {
            return Err(EvalError::Internal("empty array literal".into()));
        }
        let first = self.evaluate(&elements[0])?;
        let elem_ty = first.ty().unreferenced().clone();
        let mut bytes = crate::value::encode(&elem_ty, first.contents())?;
        for e in &elements[1..] {
            let v = self.evaluate(e)?;
            let conv = self.dialect.eval_cast(self, &elem_ty, &v)?;
            bytes.extend(crate::value::encode(&elem_ty, conv.contents())?);
        }
        Ok(Value::from_bytes(
            Type::array(elem_ty, Some(elements.len() as u64)),
            bytes,
        ))
    }

    fn eval_symbol(&self, symbol: &Symbol) -> Result<Value, EvalError> {
        match &symbol.kind {
            SymbolKind::Variable { ty, address } => {
                if self.side_effect_free() {
                    Ok(c::zero_of(ty).with_location(Location::Memory(*address)))
                } else {
                    Value::read(self.provider, ty.clone(), *address)
                }
            }
            SymbolKind::Function { ty, address } => Ok(Value::new(
                ty.clone(),
                Contents::Pointer(*address),
            )),
            SymbolKind::Typedef { ty } => Ok(Value::of_type(ty.clone())),
            _ => Err(EvalError::unknown_symbol(symbol.name.clone())),
        }
    }

    fn eval_named(&self, name: &str) -> Result<Value, EvalError> {
        let lookup = self
            .provider
            .lookup_symbol(name, self.scope, SymbolDomain::Var);
        if lookup.is_field_of_this {
            let receiver = self.eval_self()?;
            return self.dialect.eval_field(self, &receiver, name);
        }
        if let Some(sym) = lookup.symbol {
            return self.eval_symbol(&sym);
        }
        if let Some(addr) = self.provider.lookup_minimal_symbol(name) {
            return Ok(Value::from_pointer(Type::pointer(Type::Void), addr));
        }
        Err(EvalError::unknown_symbol(name))
    }

    fn eval_self(&self) -> Result<Value, EvalError> {
        let spelled = self.dialect.self_name().unwrap_or("this");
        let lookup = self
            .provider
            .lookup_symbol(spelled, self.scope, SymbolDomain::Var);
        match lookup.symbol {
            Some(sym) => self.eval_symbol(&sym),
            None => Err(EvalError::unknown_symbol(spelled)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::StaticProvider;

    fn int_lit(v: i128) -> Operation {
        Operation::IntLiteral {
            ty: Type::int(),
            value: v,
        }
    }

    #[test]
    fn literal_arithmetic() {
        let p = StaticProvider::new(0x1000, 16);
        let ev = Evaluator::new(&p, DialectKind::C);
        let tree = Operation::Binary {
            op: BinaryOpcode::Add,
            left: Box::new(int_lit(1)),
            right: Box::new(Operation::Binary {
                op: BinaryOpcode::Mul,
                left: Box::new(int_lit(2)),
                right: Box::new(int_lit(3)),
            }),
        };
        assert_eq!(ev.evaluate(&tree).unwrap().as_int(), Some(7));
    }

    #[test]
    fn division_by_zero_is_user_facing() {
        let p = StaticProvider::new(0x1000, 16);
        let ev = Evaluator::new(&p, DialectKind::C);
        let tree = Operation::Binary {
            op: BinaryOpcode::Div,
            left: Box::new(int_lit(10)),
            right: Box::new(int_lit(0)),
        };
        assert_eq!(ev.evaluate(&tree), Err(EvalError::DivisionByZero));
    }

    #[test]
    fn short_circuit_skips_unknown_symbol() {
        let p = StaticProvider::new(0x1000, 16);
        let ev = Evaluator::new(&p, DialectKind::C);
        // 0 && undefined_name() must not resolve the callee
        let tree = Operation::Binary {
            op: BinaryOpcode::LogicalAnd,
            left: Box::new(int_lit(0)),
            right: Box::new(Operation::Call {
                callee: Box::new(Operation::NamedVariable {
                    name: "undefined_name".into(),
                }),
                args: vec![],
            }),
        };
        assert_eq!(ev.evaluate(&tree).unwrap().as_int(), Some(0));
    }

    #[test]
    fn sizeof_never_reads_memory() {
        // variable whose address is far outside the provider image:
        // a side-effect-free read would fail loudly if attempted
        let mut p = StaticProvider::new(0x1000, 16);
        p.define_variable("x", Type::long(), 0xdead_0000);
        let ev = Evaluator::new(&p, DialectKind::C);
        let tree = Operation::SizeOf {
            arg: SizeArg::Expr(Box::new(Operation::NamedVariable { name: "x".into() })),
        };
        assert_eq!(ev.evaluate(&tree).unwrap().as_int(), Some(8));
    }

    #[test]
    fn unknown_symbol_surfaces_at_evaluation() {
        let p = StaticProvider::new(0x1000, 16);
        let ev = Evaluator::new(&p, DialectKind::C);
        let tree = Operation::NamedVariable {
            name: "undefined_name".into(),
        };
        assert!(matches!(
            ev.evaluate(&tree),
            Err(EvalError::UnknownSymbol { .. })
        ));
    }

    #[test]
    fn comma_yields_right_operand() {
        let p = StaticProvider::new(0x1000, 16);
        let ev = Evaluator::new(&p, DialectKind::C);
        let tree = Operation::Comma {
            left: Box::new(int_lit(1)),
            right: Box::new(int_lit(2)),
        };
        assert_eq!(ev.evaluate(&tree).unwrap().as_int(), Some(2));
    }
}
