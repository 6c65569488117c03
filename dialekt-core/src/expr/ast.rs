//! The operation tree model.
//!
//! Nodes are built bottom-up during parsing, never mutated afterwards,
//! and never shared between two parents: the tree is a strict,
//! single-rooted, acyclic ownership structure released as a unit.

use serde::{Deserialize, Serialize};

use crate::provider::Symbol;
use crate::types::{CharEncoding, Type};

/// Unary opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOpcode {
    Plus,
    Neg,
    LogicalNot,
    BitNot,
    Deref,
    AddressOf,
    PreInc,
    PreDec,
    PostInc,
    PostDec,
}

/// Binary opcodes (assignment and comma have their own node shapes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOpcode {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Shl,
    Shr,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    NotEq,
    BitAnd,
    BitXor,
    BitOr,
    LogicalAnd,
    LogicalOr,
}

/// Which cast production produced a cast node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CastKind {
    CStyle,
    Static,
    Dynamic,
    Reinterpret,
    Const,
}

impl CastKind {
    pub fn keyword(self) -> &'static str {
        match self {
            CastKind::CStyle => "",
            CastKind::Static => "static_cast",
            CastKind::Dynamic => "dynamic_cast",
            CastKind::Reinterpret => "reinterpret_cast",
            CastKind::Const => "const_cast",
        }
    }
}

/// Operand of `sizeof`/`alignof`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SizeArg {
    Type(Type),
    Expr(Box<Operation>),
}

/// The closed set of operation node variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operation {
    IntLiteral {
        ty: Type,
        value: i128,
    },
    FloatLiteral {
        ty: Type,
        value: f64,
    },
    ComplexLiteral {
        ty: Type,
        re: f64,
        im: f64,
    },
    BoolLiteral {
        value: bool,
    },
    CharLiteral {
        encoding: CharEncoding,
        value: i128,
    },
    StringLiteral {
        encoding: CharEncoding,
        bytes: Vec<u8>,
    },
    Unary {
        op: UnaryOpcode,
        operand: Box<Operation>,
    },
    Binary {
        op: BinaryOpcode,
        left: Box<Operation>,
        right: Box<Operation>,
    },
    Ternary {
        cond: Box<Operation>,
        then: Box<Operation>,
        otherwise: Box<Operation>,
    },
    Assign {
        target: Box<Operation>,
        value: Box<Operation>,
    },
    AssignModify {
        op: BinaryOpcode,
        target: Box<Operation>,
        value: Box<Operation>,
    },
    Comma {
        left: Box<Operation>,
        right: Box<Operation>,
    },
    /// Cast where the target type was written as a type-name.
    Cast {
        kind: CastKind,
        ty: Type,
        operand: Box<Operation>,
    },
    /// Cast whose target type is derived from evaluating another
    /// subtree (named casts parse their `<T>` into a type literal).
    CastDerived {
        kind: CastKind,
        type_source: Box<Operation>,
        operand: Box<Operation>,
    },
    /// `{T} addr`: re-interpret the memory the operand points at.
    MemVal {
        ty: Type,
        operand: Box<Operation>,
    },
    SizeOf {
        arg: SizeArg,
    },
    AlignOf {
        arg: SizeArg,
    },
    Subscript {
        base: Box<Operation>,
        index: Box<Operation>,
    },
    /// `.field` / `->field`.
    FieldAccess {
        base: Box<Operation>,
        field: String,
        through_pointer: bool,
    },
    /// `Scope::member` where `Scope` resolved to a type.
    ScopeAccess {
        ty: Type,
        member: String,
    },
    Call {
        callee: Box<Operation>,
        args: Vec<Operation>,
    },
    /// `{a, b, c}` array literal.
    ArrayLiteral {
        elements: Vec<Operation>,
    },
    /// A name the lexer resolved to a live symbol.
    Variable {
        symbol: Symbol,
    },
    /// A name resolution was deferred on; evaluation reports an unknown
    /// symbol if the provider still cannot resolve it.
    NamedVariable {
        name: String,
    },
    /// The implicit receiver (`this` / `self`).
    SelfRef,
    /// A type used as a value.
    TypeLiteral {
        ty: Type,
    },
    /// `Name<T1, T2>` resolved as a template instantiation.
    TypeInstance {
        name: String,
        args: Vec<Type>,
        ty: Type,
    },
    /// `[receiver selector:arg ...]` message send.
    MessageSend {
        receiver: Box<Operation>,
        selector: Vec<String>,
        args: Vec<Operation>,
    },
}

impl Operation {
    /// Number of nodes in this subtree, root included.
    pub fn node_count(&self) -> usize {
        let mut n = 0;
        self.walk(&mut |_| n += 1);
        n
    }

    /// Pre-order traversal.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a Operation)) {
        visit(self);
        match self {
            Operation::Unary { operand, .. } => operand.walk(visit),
            Operation::Binary { left, right, .. }
            | Operation::Comma { left, right } => {
                left.walk(visit);
                right.walk(visit);
            }
            Operation::Assign { target, value }
            | Operation::AssignModify { target, value, .. } => {
                target.walk(visit);
                value.walk(visit);
            }
            Operation::Ternary {
                cond,
                then,
                otherwise,
            } => {
                cond.walk(visit);
                then.walk(visit);
                otherwise.walk(visit);
            }
            Operation::Cast { operand, .. } | Operation::MemVal { operand, .. } => {
                operand.walk(visit)
            }
            Operation::CastDerived {
                type_source,
                operand,
                ..
            } => {
                type_source.walk(visit);
                operand.walk(visit);
            }
            Operation::SizeOf { arg } | Operation::AlignOf { arg } => {
                if let SizeArg::Expr(e) = arg {
                    e.walk(visit);
                }
            }
            Operation::Subscript { base, index } => {
                base.walk(visit);
                index.walk(visit);
            }
            Operation::FieldAccess { base, .. } => base.walk(visit),
            Operation::Call { callee, args } => {
                callee.walk(visit);
                for a in args {
                    a.walk(visit);
                }
            }
            Operation::ArrayLiteral { elements } => {
                for e in elements {
                    e.walk(visit);
                }
            }
            Operation::MessageSend { receiver, args, .. } => {
                receiver.walk(visit);
                for a in args {
                    a.walk(visit);
                }
            }
            _ => {}
        }
    }
}

impl UnaryOpcode {
    pub fn as_str(self) -> &'static str {
        match self {
            UnaryOpcode::Plus => "+",
            UnaryOpcode::Neg => "-",
            UnaryOpcode::LogicalNot => "!",
            UnaryOpcode::BitNot => "~",
            UnaryOpcode::Deref => "*",
            UnaryOpcode::AddressOf => "&",
            UnaryOpcode::PreInc | UnaryOpcode::PostInc => "++",
            UnaryOpcode::PreDec | UnaryOpcode::PostDec => "--",
        }
    }

    pub fn is_postfix(self) -> bool {
        matches!(self, UnaryOpcode::PostInc | UnaryOpcode::PostDec)
    }
}
