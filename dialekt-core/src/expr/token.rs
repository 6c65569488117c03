//! Token kinds and payloads produced by the lexer.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::provider::{BlockId, Symbol};
use crate::types::{CharEncoding, Type};

/// Keywords. `shadowable` keywords (see the lexer) only win over an
/// identifier when no live symbol of the same spelling is in scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Kw {
    // type specifiers
    Void,
    Bool,
    Char,
    Short,
    Int,
    Long,
    Signed,
    Unsigned,
    Float,
    Double,
    Complex,
    Struct,
    Union,
    Enum,
    Class,
    // qualifiers
    Const,
    Volatile,
    Restrict,
    Atomic,
    // operators spelled as words
    Sizeof,
    Alignof,
    StaticCast,
    DynamicCast,
    ReinterpretCast,
    ConstCast,
    This,
    True,
    False,
}

impl Kw {
    pub fn as_str(self) -> &'static str {
        match self {
            Kw::Void => "void",
            Kw::Bool => "bool",
            Kw::Char => "char",
            Kw::Short => "short",
            Kw::Int => "int",
            Kw::Long => "long",
            Kw::Signed => "signed",
            Kw::Unsigned => "unsigned",
            Kw::Float => "float",
            Kw::Double => "double",
            Kw::Complex => "_Complex",
            Kw::Struct => "struct",
            Kw::Union => "union",
            Kw::Enum => "enum",
            Kw::Class => "class",
            Kw::Const => "const",
            Kw::Volatile => "volatile",
            Kw::Restrict => "restrict",
            Kw::Atomic => "_Atomic",
            Kw::Sizeof => "sizeof",
            Kw::Alignof => "alignof",
            Kw::StaticCast => "static_cast",
            Kw::DynamicCast => "dynamic_cast",
            Kw::ReinterpretCast => "reinterpret_cast",
            Kw::ConstCast => "const_cast",
            Kw::This => "this",
            Kw::True => "true",
            Kw::False => "false",
        }
    }
}

/// One lexed token. Identifier kinds carry the classification decided
/// by symbol lookup; literal kinds carry their resolved value and type.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Int {
        value: i128,
        ty: Type,
    },
    Float {
        value: f64,
        ty: Type,
    },
    /// Literal with an imaginary suffix; `ty` is the complex type.
    Imaginary {
        value: f64,
        ty: Type,
    },
    String {
        encoding: CharEncoding,
        bytes: Vec<u8>,
    },
    CharLit {
        encoding: CharEncoding,
        value: i128,
    },
    /// A bare name, with the result of its symbol lookup attached.
    Name {
        text: String,
        symbol: Option<Symbol>,
        is_field_of_this: bool,
    },
    /// A name the provider says is a type (possibly a collapsed
    /// qualified name such as `A::B`).
    TypeName {
        text: String,
        ty: Type,
    },
    /// A name denoting a function/block scope.
    BlockName {
        text: String,
        block: BlockId,
    },
    /// A name denoting a source file.
    FileName {
        text: String,
    },
    Keyword(Kw),

    // operators, longest first in the lexer's tables
    ShlAssign, // <<=
    ShrAssign, // >>=
    Arrow,     // ->
    Inc,       // ++
    Dec,       // --
    Shl,       // <<
    Shr,       // >>
    Le,        // <=
    Ge,        // >=
    EqEq,      // ==
    NotEq,     // !=
    AndAnd,    // &&
    OrOr,      // ||
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    PercentAssign,
    AmpAssign,
    PipeAssign,
    CaretAssign,
    ColonColon,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Amp,
    Pipe,
    Caret,
    Tilde,
    Bang,
    Less,
    Greater,
    Assign,
    Question,
    Colon,
    Comma,
    Dot,
    At,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,

    /// Input ended at a name or right after `.`/`->`: the caller may
    /// offer completions for `text`.
    Complete {
        text: String,
    },
    End,
}

impl TokenKind {
    /// Short description used in diagnostics.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Int { value, .. } => format!("integer {}", value),
            TokenKind::Float { value, .. } => format!("float {}", value),
            TokenKind::Imaginary { value, .. } => format!("imaginary {}i", value),
            TokenKind::String { .. } => "string literal".into(),
            TokenKind::CharLit { .. } => "character literal".into(),
            TokenKind::Name { text, .. } => format!("name `{}`", text),
            TokenKind::TypeName { text, .. } => format!("type name `{}`", text),
            TokenKind::BlockName { text, .. } => format!("block name `{}`", text),
            TokenKind::FileName { text } => format!("file name `{}`", text),
            TokenKind::Keyword(kw) => format!("`{}`", kw.as_str()),
            TokenKind::Complete { .. } => "completion point".into(),
            TokenKind::End => "end of input".into(),
            other => format!("`{}`", other.op_str()),
        }
    }

    fn op_str(&self) -> &'static str {
        match self {
            TokenKind::ShlAssign => "<<=",
            TokenKind::ShrAssign => ">>=",
            TokenKind::Arrow => "->",
            TokenKind::Inc => "++",
            TokenKind::Dec => "--",
            TokenKind::Shl => "<<",
            TokenKind::Shr => ">>",
            TokenKind::Le => "<=",
            TokenKind::Ge => ">=",
            TokenKind::EqEq => "==",
            TokenKind::NotEq => "!=",
            TokenKind::AndAnd => "&&",
            TokenKind::OrOr => "||",
            TokenKind::PlusAssign => "+=",
            TokenKind::MinusAssign => "-=",
            TokenKind::StarAssign => "*=",
            TokenKind::SlashAssign => "/=",
            TokenKind::PercentAssign => "%=",
            TokenKind::AmpAssign => "&=",
            TokenKind::PipeAssign => "|=",
            TokenKind::CaretAssign => "^=",
            TokenKind::ColonColon => "::",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::Amp => "&",
            TokenKind::Pipe => "|",
            TokenKind::Caret => "^",
            TokenKind::Tilde => "~",
            TokenKind::Bang => "!",
            TokenKind::Less => "<",
            TokenKind::Greater => ">",
            TokenKind::Assign => "=",
            TokenKind::Question => "?",
            TokenKind::Colon => ":",
            TokenKind::Comma => ",",
            TokenKind::Dot => ".",
            TokenKind::At => "@",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            _ => "?",
        }
    }
}

/// A token plus its byte span in the original input. Tokens spliced in
/// from a macro expansion carry the span of the invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub end: usize,
}

impl Token {
    pub fn new(kind: TokenKind, start: usize, end: usize) -> Token {
        Token { kind, start, end }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind.describe())
    }
}
