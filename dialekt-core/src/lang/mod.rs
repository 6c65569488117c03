//! Language dialects.
//!
//! Each supported expression dialect implements [`Dialect`]: a fixed,
//! process-wide descriptor that contributes the accepted vocabulary and
//! the semantics of every operator. Instances are zero-sized statics;
//! a parse selects one up front and threads it through explicitly, so
//! no global mutable state is involved.

pub mod c;
pub mod go;
pub mod java;
pub mod opencl;

use serde::{Deserialize, Serialize};

use crate::expr::ast::{BinaryOpcode, UnaryOpcode};
use crate::expr::error::EvalError;
use crate::expr::eval::Evaluator;
use crate::expr::token::Kw;
use crate::types::Type;
use crate::value::Value;

/// The supported dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DialectKind {
    /// Baseline C/C++-like syntax and scalar semantics.
    C,
    /// Go-like syntax: no `::`, package-qualified names, bool results.
    Go,
    /// Object-message semantics: single-rooted classes, dynamic type
    /// resolution, bracketed message sends.
    Java,
    /// OpenCL-flavored: element-wise vector operators and swizzles.
    OpenCl,
}

impl DialectKind {
    pub fn dialect(self) -> &'static dyn Dialect {
        match self {
            DialectKind::C => &c::CDialect,
            DialectKind::Go => &go::GoDialect,
            DialectKind::Java => &java::JavaDialect,
            DialectKind::OpenCl => &opencl::OpenClDialect,
        }
    }
}

/// Operator precedence, lowest binds loosest. Shared between the parser
/// and the printer so re-rendering exactly inverts grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Prec {
    Comma,
    Assign,
    Ternary,
    LogicalOr,
    LogicalAnd,
    BitOr,
    BitXor,
    BitAnd,
    Equality,
    Relational,
    Shift,
    Additive,
    Multiplicative,
    Unary,
    Postfix,
    Primary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assoc {
    Left,
    Right,
}

/// Print string, precedence and associativity of one operator.
#[derive(Debug, Clone, Copy)]
pub struct OpInfo {
    pub text: &'static str,
    pub prec: Prec,
    pub assoc: Assoc,
}

/// Descriptor for a binary opcode; identical across dialects (dialects
/// differ in evaluation, not in how the shared operators print).
pub fn binary_op_info(op: BinaryOpcode) -> OpInfo {
    use BinaryOpcode::*;
    let (text, prec) = match op {
        Add => ("+", Prec::Additive),
        Sub => ("-", Prec::Additive),
        Mul => ("*", Prec::Multiplicative),
        Div => ("/", Prec::Multiplicative),
        Rem => ("%", Prec::Multiplicative),
        Shl => ("<<", Prec::Shift),
        Shr => (">>", Prec::Shift),
        Lt => ("<", Prec::Relational),
        Gt => (">", Prec::Relational),
        Le => ("<=", Prec::Relational),
        Ge => (">=", Prec::Relational),
        Eq => ("==", Prec::Equality),
        NotEq => ("!=", Prec::Equality),
        BitAnd => ("&", Prec::BitAnd),
        BitXor => ("^", Prec::BitXor),
        BitOr => ("|", Prec::BitOr),
        LogicalAnd => ("&&", Prec::LogicalAnd),
        LogicalOr => ("||", Prec::LogicalOr),
    };
    OpInfo {
        text,
        prec,
        assoc: Assoc::Left,
    }
}

pub fn unary_op_info(op: UnaryOpcode) -> OpInfo {
    OpInfo {
        text: op.as_str(),
        prec: Prec::Unary,
        assoc: Assoc::Right,
    }
}

/// A per-dialect language descriptor. Implementations are stateless and
/// `Sync`; all mutable evaluation state lives in the [`Evaluator`].
pub trait Dialect: Sync {
    fn kind(&self) -> DialectKind;

    fn name(&self) -> &'static str;

    // ---- vocabulary -------------------------------------------------

    /// Whether `A::B` scope resolution is part of the grammar.
    fn has_scope_operator(&self) -> bool {
        true
    }

    /// Whether the C++ named casts (`static_cast<T>(e)`, ...) parse.
    fn has_named_casts(&self) -> bool {
        false
    }

    /// Whether `[receiver selector:arg]` message sends parse.
    fn has_message_send(&self) -> bool {
        false
    }

    /// Whether backquoted raw string literals lex.
    fn has_raw_strings(&self) -> bool {
        false
    }

    /// Spelling of the implicit receiver, if the dialect has one.
    fn self_name(&self) -> Option<&'static str> {
        None
    }

    /// Width of a plain `int` literal; drives narrowest-fit typing.
    fn int_bits(&self) -> u32 {
        32
    }

    fn long_bits(&self) -> u32 {
        64
    }

    fn long_long_bits(&self) -> u32 {
        64
    }

    /// Keyword lookup: `Some((kw, shadowable))` when `text` is a keyword
    /// of this dialect. Shadowable keywords lose to a live symbol of the
    /// same spelling.
    fn keyword(&self, text: &str) -> Option<(Kw, bool)>;

    // ---- semantics --------------------------------------------------

    /// Whether `&&`/`||` short-circuit. Vector dialects evaluate both
    /// operands unconditionally.
    fn short_circuits(&self) -> bool {
        true
    }

    fn eval_binary(
        &self,
        ev: &Evaluator<'_>,
        op: BinaryOpcode,
        lhs: &Value,
        rhs: &Value,
    ) -> Result<Value, EvalError>;

    fn eval_unary(
        &self,
        ev: &Evaluator<'_>,
        op: UnaryOpcode,
        operand: &Value,
    ) -> Result<Value, EvalError>;

    fn eval_cast(&self, ev: &Evaluator<'_>, to: &Type, v: &Value) -> Result<Value, EvalError>;

    /// `.name` access; dialects override for swizzles or dynamic types.
    fn eval_field(
        &self,
        ev: &Evaluator<'_>,
        base: &Value,
        field: &str,
    ) -> Result<Value, EvalError>;

    /// Scalar truth value used by `&&`/`||`/`?:`/`!`.
    fn truthy(&self, ev: &Evaluator<'_>, v: &Value) -> Result<bool, EvalError>;

    /// How a short-circuited logical result is shaped (`int` 0/1 for the
    /// C family, `bool` for Go).
    fn logical_result(&self, v: bool) -> Value {
        Value::from_int(Type::int(), i128::from(v))
    }

    /// `[receiver selector:arg ...]`; only the object-message dialect
    /// implements this.
    fn eval_message(
        &self,
        _ev: &Evaluator<'_>,
        _receiver: &Value,
        _selector: &[String],
        _args: &[Value],
    ) -> Result<Value, EvalError> {
        Err(EvalError::not_supported("message sends"))
    }

    /// Most-derived type of a live object, when the dialect can tell.
    fn dynamic_type(&self, _ev: &Evaluator<'_>, _v: &Value) -> Result<Option<Type>, EvalError> {
        Ok(None)
    }
}

/// Keyword table shared by the C-family dialects. Go and the
/// object-message dialect trim or extend it.
pub(crate) fn c_keyword(text: &str) -> Option<(Kw, bool)> {
    let (kw, shadow) = match text {
        "void" => (Kw::Void, false),
        "bool" => (Kw::Bool, true),
        "char" => (Kw::Char, false),
        "short" => (Kw::Short, false),
        "int" => (Kw::Int, false),
        "long" => (Kw::Long, false),
        "signed" => (Kw::Signed, false),
        "unsigned" => (Kw::Unsigned, false),
        "float" => (Kw::Float, false),
        "double" => (Kw::Double, false),
        "_Complex" => (Kw::Complex, false),
        "struct" => (Kw::Struct, false),
        "union" => (Kw::Union, false),
        "enum" => (Kw::Enum, false),
        "class" => (Kw::Class, true),
        "const" => (Kw::Const, false),
        "volatile" => (Kw::Volatile, false),
        "restrict" => (Kw::Restrict, true),
        "_Atomic" => (Kw::Atomic, false),
        "sizeof" => (Kw::Sizeof, false),
        "alignof" => (Kw::Alignof, true),
        "_Alignof" => (Kw::Alignof, false),
        "static_cast" => (Kw::StaticCast, true),
        "dynamic_cast" => (Kw::DynamicCast, true),
        "reinterpret_cast" => (Kw::ReinterpretCast, true),
        "const_cast" => (Kw::ConstCast, true),
        "this" => (Kw::This, true),
        "true" => (Kw::True, true),
        "false" => (Kw::False, true),
        _ => return None,
    };
    Some((kw, shadow))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precedence_ladder_orders() {
        assert!(Prec::Comma < Prec::Assign);
        assert!(Prec::LogicalOr < Prec::LogicalAnd);
        assert!(Prec::Additive < Prec::Multiplicative);
        assert!(Prec::Unary < Prec::Postfix);
    }

    #[test]
    fn descriptor_table_is_consistent() {
        assert_eq!(binary_op_info(BinaryOpcode::Add).text, "+");
        assert_eq!(binary_op_info(BinaryOpcode::Shl).prec, Prec::Shift);
        assert_eq!(
            binary_op_info(BinaryOpcode::LogicalOr).prec,
            Prec::LogicalOr
        );
    }

    #[test]
    fn shadowable_keywords() {
        assert_eq!(c_keyword("this"), Some((Kw::This, true)));
        assert_eq!(c_keyword("int"), Some((Kw::Int, false)));
        assert_eq!(c_keyword("frobnicate"), None);
    }
}
