//! Go-flavored dialect.
//!
//! Shares the C operator chain and numeric scanner; the differences are
//! vocabulary-level (no `::`, no named casts, package-qualified names,
//! backquoted raw strings) plus strictly boolean conditions and
//! comparison results.

use crate::expr::ast::{BinaryOpcode, UnaryOpcode};
use crate::expr::error::EvalError;
use crate::expr::eval::Evaluator;
use crate::expr::token::Kw;
use crate::lang::{c, Dialect, DialectKind};
use crate::types::Type;
use crate::value::{Contents, Scalar, Value};

pub struct GoDialect;

impl Dialect for GoDialect {
    fn kind(&self) -> DialectKind {
        DialectKind::Go
    }

    fn name(&self) -> &'static str {
        "go"
    }

    fn has_scope_operator(&self) -> bool {
        false
    }

    fn has_raw_strings(&self) -> bool {
        true
    }

    fn int_bits(&self) -> u32 {
        64
    }

    fn keyword(&self, text: &str) -> Option<(Kw, bool)> {
        match text {
            "true" => Some((Kw::True, true)),
            "false" => Some((Kw::False, true)),
            "struct" => Some((Kw::Struct, false)),
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
        // string concatenation
        if op == BinaryOpcode::Add {
            if let (Contents::Bytes(a), Contents::Bytes(b)) = (lhs.contents(), rhs.contents()) {
                let mut bytes = a.clone();
                bytes.extend_from_slice(b);
                let len = bytes.len() as u64;
                return Ok(Value::from_bytes(
                    Type::array(Type::char(), Some(len)),
                    bytes,
                ));
            }
        }
        let result = c::binary_scalar(ev, op, lhs, rhs)?;
        Ok(booleanize(op, result))
    }

    fn eval_unary(
        &self,
        ev: &Evaluator<'_>,
        op: UnaryOpcode,
        operand: &Value,
    ) -> Result<Value, EvalError> {
        if op == UnaryOpcode::LogicalNot {
            let b = self.truthy(ev, operand)?;
            return Ok(Value::from_bool(!b));
        }
        c::unary_scalar(ev, op, operand)
    }

    fn eval_cast(&self, ev: &Evaluator<'_>, to: &Type, v: &Value) -> Result<Value, EvalError> {
        c::cast_scalar(ev, to, v)
    }

    fn eval_field(
        &self,
        ev: &Evaluator<'_>,
        base: &Value,
        field: &str,
    ) -> Result<Value, EvalError> {
        c::field_scalar(ev, base, field)
    }

    /// Go conditions are boolean, never "nonzero".
    fn truthy(&self, _ev: &Evaluator<'_>, v: &Value) -> Result<bool, EvalError> {
        match v.contents() {
            Contents::Scalar(Scalar::Bool(b)) => Ok(*b),
            _ => Err(EvalError::TypeMismatch {
                expected: "bool".into(),
                found: v.ty().display_name(),
            }),
        }
    }

    fn logical_result(&self, v: bool) -> Value {
        Value::from_bool(v)
    }
}

/// Comparison and logical results are `bool` in Go.
fn booleanize(op: BinaryOpcode, v: Value) -> Value {
    use BinaryOpcode::*;
    match op {
        Lt | Gt | Le | Ge | Eq | NotEq | LogicalAnd | LogicalOr => {
            Value::from_bool(v.as_int().unwrap_or(0) != 0)
        }
        _ => v,
    }
}
