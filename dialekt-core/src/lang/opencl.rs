//! OpenCL-flavored dialect: element-wise vector operators, scalar
//! widening by replication, and swizzle component access.
//!
//! Comparison and logical operators on vectors produce a signed integer
//! vector with -1 for true lanes; `&&`/`||` never short-circuit here,
//! both operands are always evaluated.

use crate::expr::ast::{BinaryOpcode, UnaryOpcode};
use crate::expr::error::EvalError;
use crate::expr::eval::Evaluator;
use crate::expr::token::Kw;
use crate::lang::{c, c_keyword, Dialect, DialectKind};
use crate::types::Type;
use crate::value::{Contents, Location, Scalar, Value};

pub struct OpenClDialect;

/// Lane counts a vector type (or swizzle result) may have.
pub const VALID_LANE_COUNTS: &[usize] = &[1, 2, 3, 4, 8, 16];

/// Map a swizzle spelling to lane indices for a `lanes`-wide vector.
/// Returns `None` when the spelling is not a swizzle at all; an error
/// when it is one but selects out-of-range lanes.
pub fn parse_swizzle(field: &str, lanes: u32) -> Option<Result<Vec<u32>, EvalError>> {
    let half = (lanes + 1) / 2;
    let indices: Vec<u32> = match field {
        "lo" => (0..half).collect(),
        "hi" => (half..lanes).collect(),
        "even" => (0..lanes).step_by(2).collect(),
        "odd" => (1..lanes).step_by(2).collect(),
        _ => {
            if let Some(digits) = field.strip_prefix('s').or_else(|| field.strip_prefix('S')) {
                if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
                    return None;
                }
                digits
                    .chars()
                    .map(|c| c.to_digit(16).unwrap())
                    .collect()
            } else if !field.is_empty()
                && field.chars().all(|c| matches!(c, 'x' | 'y' | 'z' | 'w'))
            {
                field
                    .chars()
                    .map(|c| match c {
                        'x' => 0,
                        'y' => 1,
                        'z' => 2,
                        _ => 3,
                    })
                    .collect()
            } else {
                return None;
            }
        }
    };
    if indices.iter().any(|&i| i >= lanes) || !VALID_LANE_COUNTS.contains(&indices.len()) {
        return Some(Err(EvalError::VectorBounds {
            type_name: format!("vector of {} lanes", lanes),
        }));
    }
    Some(Ok(indices))
}

fn has_duplicates(indices: &[u32]) -> bool {
    let mut seen = 0u32;
    for &i in indices {
        if seen & (1 << i) != 0 {
            return true;
        }
        seen |= 1 << i;
    }
    false
}

/// Per-lane view of an operand: replicate scalars across `lanes`.
fn widened_lanes(v: &Value, lanes: usize) -> Result<Vec<Scalar>, EvalError> {
    match v.contents() {
        Contents::Vector(ls) => {
            if ls.len() != lanes {
                Err(EvalError::no_matching_operator(
                    "<vector op>",
                    v.ty().display_name(),
                    format!("vector of {} lanes", lanes),
                ))
            } else {
                Ok(ls.clone())
            }
        }
        _ => {
            let s = v.as_scalar().ok_or(EvalError::NotArithmetic)?;
            Ok(vec![s; lanes])
        }
    }
}

fn element_type(ty: &Type) -> Type {
    ty.element().cloned().unwrap_or_else(Type::int)
}

/// Signed integer element type carrying vector comparison results.
fn compare_element(elem: &Type) -> Type {
    let bits = match elem.unqualified() {
        Type::Int { bits, .. } | Type::Float { bits, .. } => *bits,
        _ => 32,
    };
    match bits {
        8 => Type::signed_char(),
        16 => Type::short(),
        64 => Type::long(),
        _ => Type::int(),
    }
}

fn is_comparison(op: BinaryOpcode) -> bool {
    use BinaryOpcode::*;
    matches!(op, Lt | Gt | Le | Ge | Eq | NotEq | LogicalAnd | LogicalOr)
}

impl Dialect for OpenClDialect {
    fn kind(&self) -> DialectKind {
        DialectKind::OpenCl
    }

    fn name(&self) -> &'static str {
        "opencl"
    }

    fn keyword(&self, text: &str) -> Option<(Kw, bool)> {
        c_keyword(text)
    }

    /// Both operands of `&&`/`||` are always evaluated.
    fn short_circuits(&self) -> bool {
        false
    }

    fn eval_binary(
        &self,
        ev: &Evaluator<'_>,
        op: BinaryOpcode,
        lhs: &Value,
        rhs: &Value,
    ) -> Result<Value, EvalError> {
        let lv = lhs.ty().unreferenced().is_vector();
        let rv = rhs.ty().unreferenced().is_vector();
        if !lv && !rv {
            return c::binary_scalar(ev, op, lhs, rhs);
        }
        let vec_side = if lv { lhs.ty() } else { rhs.ty() };
        let vec_ty = vec_side.unreferenced().unqualified().clone();
        let lanes = vec_ty.vector_lanes().ok_or_else(|| EvalError::VectorBounds {
            type_name: vec_ty.display_name(),
        })? as usize;
        let elem = element_type(&vec_ty);
        let ls = widened_lanes(lhs, lanes)?;
        let rs = widened_lanes(rhs, lanes)?;

        let mut out = Vec::with_capacity(lanes);
        for (a, b) in ls.iter().zip(&rs) {
            let av = scalar_value(&elem, *a);
            let bv = scalar_value(&elem, *b);
            let r = c::binary_scalar(ev, op, &av, &bv)?;
            if is_comparison(op) {
                // -1/0 per lane
                let t = r.as_int().unwrap_or(0) != 0;
                out.push(Scalar::Int(if t { -1 } else { 0 }));
            } else {
                out.push(r.as_scalar().ok_or(EvalError::NotArithmetic)?);
            }
        }

        let result_ty = if is_comparison(op) {
            Type::vector(compare_element(&elem), lanes as u32)
        } else {
            vec_ty
        };
        Ok(Value::from_vector(result_ty, out))
    }

    fn eval_unary(
        &self,
        ev: &Evaluator<'_>,
        op: UnaryOpcode,
        operand: &Value,
    ) -> Result<Value, EvalError> {
        let ty = operand.ty().unreferenced().unqualified().clone();
        if !ty.is_vector() {
            return c::unary_scalar(ev, op, operand);
        }
        let lanes = operand.lanes().ok_or_else(|| EvalError::VectorBounds {
            type_name: ty.display_name(),
        })?;
        let elem = element_type(&ty);
        let mut out = Vec::with_capacity(lanes.len());
        for s in lanes {
            match op {
                UnaryOpcode::LogicalNot => {
                    out.push(Scalar::Int(if s.is_nonzero() { 0 } else { -1 }));
                }
                _ => {
                    let r = c::unary_scalar(ev, op, &scalar_value(&elem, *s))?;
                    out.push(r.as_scalar().ok_or(EvalError::NotArithmetic)?);
                }
            }
        }
        let result_ty = if matches!(op, UnaryOpcode::LogicalNot) {
            Type::vector(compare_element(&elem), lanes.len() as u32)
        } else {
            ty
        };
        Ok(Value::from_vector(result_ty, out))
    }

    fn eval_cast(&self, ev: &Evaluator<'_>, to: &Type, v: &Value) -> Result<Value, EvalError> {
        let target = to.unqualified().clone();
        if let Type::Vector { element, lanes } = &target {
            // A struct/class value is never implicitly vector-widened.
            if v.ty().unreferenced().is_struct() {
                return Err(EvalError::invalid_cast(
                    v.ty().display_name(),
                    target.display_name(),
                ));
            }
            let src: Vec<Scalar> = match v.contents() {
                Contents::Vector(ls) => {
                    if ls.len() != *lanes as usize {
                        return Err(EvalError::invalid_cast(
                            v.ty().display_name(),
                            target.display_name(),
                        ));
                    }
                    ls.clone()
                }
                _ => {
                    let s = v.as_scalar().ok_or(EvalError::NotArithmetic)?;
                    vec![s; *lanes as usize]
                }
            };
            let mut out = Vec::with_capacity(src.len());
            for s in src {
                let conv = c::cast_scalar(ev, element, &scalar_value(&element_type(&target), s))?;
                out.push(conv.as_scalar().ok_or(EvalError::NotArithmetic)?);
            }
            return Ok(Value::from_vector(target, out));
        }
        if v.ty().unreferenced().is_vector() {
            return Err(EvalError::invalid_cast(
                v.ty().display_name(),
                target.display_name(),
            ));
        }
        c::cast_scalar(ev, to, v)
    }

    /// Component access on vectors is swizzle selection, not field
    /// lookup. Addressable sources with duplicate-free lane lists yield
    /// a read/write view aliasing the original storage.
    fn eval_field(
        &self,
        ev: &Evaluator<'_>,
        base: &Value,
        field: &str,
    ) -> Result<Value, EvalError> {
        let ty = base.ty().unreferenced().unqualified().clone();
        let lanes = match ty.vector_lanes() {
            Some(n) => n,
            None => return c::field_scalar(ev, base, field),
        };
        let indices = match parse_swizzle(field, lanes) {
            Some(r) => r?,
            None => {
                return Err(EvalError::no_such_field(field, ty.display_name()));
            }
        };

        // Re-read the source fresh; a swizzle never serves cached data.
        let fresh = if ev.side_effect_free() {
            base.clone()
        } else {
            base.refetch(ev.provider())?
        };
        let src = fresh.lanes().ok_or_else(|| EvalError::VectorBounds {
            type_name: ty.display_name(),
        })?;
        let mut gathered = Vec::with_capacity(indices.len());
        for &i in &indices {
            let s = src.get(i as usize).ok_or_else(|| EvalError::VectorBounds {
                type_name: ty.display_name(),
            })?;
            gathered.push(*s);
        }

        let elem = element_type(&ty);
        let mut result = if gathered.len() == 1 {
            Value::new(elem, Contents::Scalar(gathered[0]))
        } else {
            Value::from_vector(
                Type::vector(elem, gathered.len() as u32),
                gathered,
            )
        };
        if base.is_lvalue() && !has_duplicates(&indices) {
            result = result.with_location(Location::Swizzle {
                parent: Box::new(base.clone()),
                lanes: indices,
            });
        }
        Ok(result)
    }

    fn truthy(&self, _ev: &Evaluator<'_>, v: &Value) -> Result<bool, EvalError> {
        c::truthy_scalar(v)
    }
}

fn scalar_value(elem: &Type, s: Scalar) -> Value {
    Value::new(elem.clone(), Contents::Scalar(s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swizzle_letters_and_named_groups() {
        assert_eq!(parse_swizzle("xyzw", 4).unwrap().unwrap(), vec![0, 1, 2, 3]);
        assert_eq!(parse_swizzle("lo", 4).unwrap().unwrap(), vec![0, 1]);
        assert_eq!(parse_swizzle("hi", 4).unwrap().unwrap(), vec![2, 3]);
        assert_eq!(parse_swizzle("even", 4).unwrap().unwrap(), vec![0, 2]);
        assert_eq!(parse_swizzle("odd", 4).unwrap().unwrap(), vec![1, 3]);
        assert_eq!(parse_swizzle("s31", 4).unwrap().unwrap(), vec![3, 1]);
    }

    #[test]
    fn width3_groups_select_only_real_lanes() {
        assert_eq!(parse_swizzle("lo", 3).unwrap().unwrap(), vec![0, 1]);
        assert_eq!(parse_swizzle("hi", 3).unwrap().unwrap(), vec![2]);
        assert_eq!(parse_swizzle("even", 3).unwrap().unwrap(), vec![0, 2]);
        assert_eq!(parse_swizzle("odd", 3).unwrap().unwrap(), vec![1]);
    }

    #[test]
    fn out_of_range_lane_is_an_error_not_a_field() {
        assert!(parse_swizzle("w", 2).unwrap().is_err());
        assert!(parse_swizzle("s7", 4).unwrap().is_err());
    }

    #[test]
    fn non_swizzle_names_are_not_swizzles() {
        assert!(parse_swizzle("length", 4).is_none());
        assert!(parse_swizzle("sx", 4).is_none());
        assert!(parse_swizzle("", 4).is_none());
    }

    #[test]
    fn duplicate_detection() {
        assert!(has_duplicates(&[0, 0]));
        assert!(!has_duplicates(&[0, 1, 2, 3]));
    }
}
