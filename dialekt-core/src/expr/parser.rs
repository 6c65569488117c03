//! Grammar engine: a Pratt parser over the classified token stream.
//!
//! An explicit `Parser` context owns the lexer, the one-token lookahead,
//! the declarator type-stack and the completion state; nothing global is
//! touched, so independent parses are freely re-entrant. Errors unwind
//! immediately and totally - no partial tree ever escapes - and embed
//! the unconsumed remainder of the input.

use log::debug;

use crate::expr::ast::{BinaryOpcode, CastKind, Operation, SizeArg, UnaryOpcode};
use crate::expr::error::ParseError;
use crate::expr::lexer::Lexer;
use crate::expr::token::{Kw, Token, TokenKind};
use crate::expr::typestack::{TypeMod, TypeStack};
use crate::lang::{Dialect, DialectKind, Prec};
use crate::provider::{BlockId, Provider};
use crate::types::{Type, TypeQual};

const MAX_DEPTH: usize = 256;

/// Where a completion point was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionKind {
    /// A bare name at the end of input.
    Name,
    /// A field name after `.`/`->`; the base subtree is in the parse
    /// result.
    Field,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionPoint {
    pub text: String,
    pub kind: CompletionKind,
}

/// A successful parse: the operation tree plus the dialect it was
/// parsed under and an optional completion point.
#[derive(Debug, Clone)]
pub struct ParsedExpression {
    pub root: Operation,
    pub dialect: DialectKind,
    pub completion: Option<CompletionPoint>,
}

/// Parse `src` under `dialect`, resolving identifiers through
/// `provider` in `scope`.
pub fn parse_expression(
    src: &str,
    dialect: DialectKind,
    provider: &dyn Provider,
    scope: Option<BlockId>,
) -> Result<ParsedExpression, ParseError> {
    Parser::new(src, dialect, provider, scope, false)?.run()
}

/// Like [`parse_expression`], but an input that stops at a name or
/// right after `.`/`->` yields a completion point instead of a syntax
/// error at end-of-input.
pub fn parse_for_completion(
    src: &str,
    dialect: DialectKind,
    provider: &dyn Provider,
    scope: Option<BlockId>,
) -> Result<ParsedExpression, ParseError> {
    Parser::new(src, dialect, provider, scope, true)?.run()
}

struct Parser<'a> {
    lexer: Lexer<'a>,
    tok: Token,
    dialect: &'static dyn Dialect,
    kind: DialectKind,
    provider: &'a dyn Provider,
    scope: Option<BlockId>,
    type_stack: TypeStack,
    completion: Option<CompletionPoint>,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(
        src: &'a str,
        kind: DialectKind,
        provider: &'a dyn Provider,
        scope: Option<BlockId>,
        completion: bool,
    ) -> Result<Parser<'a>, ParseError> {
        let dialect = kind.dialect();
        debug!("parsing with the {} dialect", dialect.name());
        let mut lexer = Lexer::new(src, dialect, provider, scope);
        if completion {
            lexer.enable_completion();
        }
        let tok = lexer.next_token()?;
        Ok(Parser {
            lexer,
            tok,
            dialect,
            kind,
            provider,
            scope,
            type_stack: TypeStack::new(),
            completion: None,
            depth: 0,
        })
    }

    fn run(mut self) -> Result<ParsedExpression, ParseError> {
        let root = self.parse_prec(Prec::Comma)?;
        if !matches!(self.tok.kind, TokenKind::End) {
            return Err(self.syntax_error());
        }
        self.type_stack.check_drained()?;
        Ok(ParsedExpression {
            root,
            dialect: self.kind,
            completion: self.completion,
        })
    }

    // ---- plumbing ---------------------------------------------------

    fn bump(&mut self) -> Result<Token, ParseError> {
        let next = self.lexer.next_token()?;
        Ok(std::mem::replace(&mut self.tok, next))
    }

    fn eat(&mut self, kind: &TokenKind) -> Result<bool, ParseError> {
        if &self.tok.kind == kind {
            self.bump()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> Result<Token, ParseError> {
        if &self.tok.kind == kind {
            self.bump()
        } else {
            Err(self.syntax_error())
        }
    }

    /// Syntax error carrying the unconsumed remainder of the input.
    fn syntax_error(&self) -> ParseError {
        let src = self.lexer.source();
        let at = self.tok.start.min(src.len());
        ParseError::syntax(src[at..].trim().to_string())
    }

    fn enter(&mut self) -> Result<(), ParseError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ParseError::semantic("Expression too complex."));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    // ---- expression grammar ----------------------------------------

    fn parse_prec(&mut self, min: Prec) -> Result<Operation, ParseError> {
        self.enter()?;
        let result = self.parse_prec_inner(min);
        self.leave();
        result
    }

    fn parse_prec_inner(&mut self, min: Prec) -> Result<Operation, ParseError> {
        let mut lhs = self.parse_unary()?;
        loop {
            lhs = match &self.tok.kind {
                TokenKind::Comma if min <= Prec::Comma => {
                    self.bump()?;
                    let rhs = self.parse_prec(Prec::Assign)?;
                    Operation::Comma {
                        left: Box::new(lhs),
                        right: Box::new(rhs),
                    }
                }
                TokenKind::Assign if min <= Prec::Assign => {
                    self.bump()?;
                    // right-associative
                    let rhs = self.parse_prec(Prec::Assign)?;
                    Operation::Assign {
                        target: Box::new(lhs),
                        value: Box::new(rhs),
                    }
                }
                TokenKind::Question if min <= Prec::Ternary => {
                    self.bump()?;
                    let then = self.parse_prec(Prec::Assign)?;
                    self.expect(&TokenKind::Colon)?;
                    let otherwise = self.parse_prec(Prec::Ternary)?;
                    Operation::Ternary {
                        cond: Box::new(lhs),
                        then: Box::new(then),
                        otherwise: Box::new(otherwise),
                    }
                }
                kind => {
                    if let Some(op) = assign_modify_op(kind) {
                        if min <= Prec::Assign {
                            self.bump()?;
                            let rhs = self.parse_prec(Prec::Assign)?;
                            Operation::AssignModify {
                                op,
                                target: Box::new(lhs),
                                value: Box::new(rhs),
                            }
                        } else {
                            break;
                        }
                    } else if let Some((op, prec)) = binary_op(kind) {
                        if min <= prec {
                            self.bump()?;
                            let rhs = self.parse_prec(next_tighter(prec))?;
                            Operation::Binary {
                                op,
                                left: Box::new(lhs),
                                right: Box::new(rhs),
                            }
                        } else {
                            break;
                        }
                    } else {
                        break;
                    }
                }
            };
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Operation, ParseError> {
        self.enter()?;
        let result = self.parse_unary_inner();
        self.leave();
        result
    }

    fn parse_unary_inner(&mut self) -> Result<Operation, ParseError> {
        let prefix = match &self.tok.kind {
            TokenKind::Plus => Some(UnaryOpcode::Plus),
            TokenKind::Minus => Some(UnaryOpcode::Neg),
            TokenKind::Bang => Some(UnaryOpcode::LogicalNot),
            TokenKind::Tilde => Some(UnaryOpcode::BitNot),
            TokenKind::Star => Some(UnaryOpcode::Deref),
            TokenKind::Amp => Some(UnaryOpcode::AddressOf),
            TokenKind::Inc => Some(UnaryOpcode::PreInc),
            TokenKind::Dec => Some(UnaryOpcode::PreDec),
            _ => None,
        };
        if let Some(op) = prefix {
            self.bump()?;
            let operand = self.parse_unary()?;
            return Ok(Operation::Unary {
                op,
                operand: Box::new(operand),
            });
        }

        match &self.tok.kind {
            TokenKind::Keyword(Kw::Sizeof) => {
                self.bump()?;
                let arg = self.parse_size_arg()?;
                Ok(Operation::SizeOf { arg })
            }
            TokenKind::Keyword(Kw::Alignof) => {
                self.bump()?;
                let arg = self.parse_size_arg()?;
                Ok(Operation::AlignOf { arg })
            }
            TokenKind::Keyword(
                kw @ (Kw::StaticCast | Kw::DynamicCast | Kw::ReinterpretCast | Kw::ConstCast),
            ) if self.dialect.has_named_casts() => {
                let kind = match kw {
                    Kw::StaticCast => CastKind::Static,
                    Kw::DynamicCast => CastKind::Dynamic,
                    Kw::ReinterpretCast => CastKind::Reinterpret,
                    _ => CastKind::Const,
                };
                self.bump()?;
                self.expect(&TokenKind::Less)?;
                let ty = self.parse_type_name()?;
                self.expect(&TokenKind::Greater)?;
                self.expect(&TokenKind::LParen)?;
                let operand = self.parse_prec(Prec::Comma)?;
                self.expect(&TokenKind::RParen)?;
                Ok(Operation::CastDerived {
                    kind,
                    type_source: Box::new(Operation::TypeLiteral { ty }),
                    operand: Box::new(operand),
                })
            }
            TokenKind::LParen => {
                self.bump()?;
                if self.starts_type() {
                    let ty = self.parse_type_name()?;
                    self.expect(&TokenKind::RParen)?;
                    let operand = self.parse_unary()?;
                    return Ok(Operation::Cast {
                        kind: CastKind::CStyle,
                        ty,
                        operand: Box::new(operand),
                    });
                }
                let inner = self.parse_prec(Prec::Comma)?;
                self.expect(&TokenKind::RParen)?;
                self.parse_postfix_ops(inner)
            }
            TokenKind::LBrace => {
                self.bump()?;
                if self.starts_type() {
                    let ty = self.parse_type_name()?;
                    self.expect(&TokenKind::RBrace)?;
                    let operand = self.parse_unary()?;
                    return Ok(Operation::MemVal {
                        ty,
                        operand: Box::new(operand),
                    });
                }
                let mut elements = vec![self.parse_prec(Prec::Assign)?];
                while self.eat(&TokenKind::Comma)? {
                    elements.push(self.parse_prec(Prec::Assign)?);
                }
                self.expect(&TokenKind::RBrace)?;
                self.parse_postfix_ops(Operation::ArrayLiteral { elements })
            }
            TokenKind::LBracket if self.dialect.has_message_send() => {
                self.parse_message_send()
            }
            _ => {
                let primary = self.parse_primary()?;
                self.parse_postfix_ops(primary)
            }
        }
    }

    fn parse_size_arg(&mut self) -> Result<SizeArg, ParseError> {
        if matches!(self.tok.kind, TokenKind::LParen) {
            // peek past the paren: type or parenthesized expression
            self.bump()?;
            if self.starts_type() {
                let ty = self.parse_type_name()?;
                self.expect(&TokenKind::RParen)?;
                return Ok(SizeArg::Type(ty));
            }
            let inner = self.parse_prec(Prec::Comma)?;
            self.expect(&TokenKind::RParen)?;
            let full = self.parse_postfix_ops(inner)?;
            return Ok(SizeArg::Expr(Box::new(full)));
        }
        let operand = self.parse_unary()?;
        Ok(SizeArg::Expr(Box::new(operand)))
    }

    fn parse_message_send(&mut self) -> Result<Operation, ParseError> {
        self.expect(&TokenKind::LBracket)?;
        let receiver = self.parse_prec(Prec::Ternary)?;
        let mut selector = Vec::new();
        let mut args = Vec::new();
        loop {
            let part = match &self.tok.kind {
                TokenKind::Name { text, .. } => text.clone(),
                TokenKind::TypeName { text, .. } => text.clone(),
                TokenKind::RBracket if !selector.is_empty() => break,
                _ => return Err(self.syntax_error()),
            };
            self.bump()?;
            selector.push(part);
            if self.eat(&TokenKind::Colon)? {
                args.push(self.parse_prec(Prec::Assign)?);
                if matches!(self.tok.kind, TokenKind::RBracket) {
                    break;
                }
            } else {
                // unary selector: single part, no arguments
                break;
            }
        }
        self.expect(&TokenKind::RBracket)?;
        Ok(Operation::MessageSend {
            receiver: Box::new(receiver),
            selector,
            args,
        })
    }

    fn parse_postfix_ops(&mut self, mut expr: Operation) -> Result<Operation, ParseError> {
        loop {
            expr = match &self.tok.kind {
                TokenKind::LParen => {
                    self.bump()?;
                    let mut args = Vec::new();
                    if !matches!(self.tok.kind, TokenKind::RParen) {
                        args.push(self.parse_prec(Prec::Assign)?);
                        while self.eat(&TokenKind::Comma)? {
                            args.push(self.parse_prec(Prec::Assign)?);
                        }
                    }
                    self.expect(&TokenKind::RParen)?;
                    Operation::Call {
                        callee: Box::new(expr),
                        args,
                    }
                }
                TokenKind::LBracket => {
                    self.bump()?;
                    let index = self.parse_prec(Prec::Comma)?;
                    self.expect(&TokenKind::RBracket)?;
                    Operation::Subscript {
                        base: Box::new(expr),
                        index: Box::new(index),
                    }
                }
                TokenKind::Dot | TokenKind::Arrow => {
                    let through_pointer = matches!(self.tok.kind, TokenKind::Arrow);
                    self.bump()?;
                    let field = self.parse_member_name()?;
                    Operation::FieldAccess {
                        base: Box::new(expr),
                        field,
                        through_pointer,
                    }
                }
                TokenKind::Inc => {
                    self.bump()?;
                    Operation::Unary {
                        op: UnaryOpcode::PostInc,
                        operand: Box::new(expr),
                    }
                }
                TokenKind::Dec => {
                    self.bump()?;
                    Operation::Unary {
                        op: UnaryOpcode::PostDec,
                        operand: Box::new(expr),
                    }
                }
                _ => break,
            };
        }
        Ok(expr)
    }

    /// A member name after `.`/`->`/`::`, which may be a completion
    /// point when the input ends there.
    fn parse_member_name(&mut self) -> Result<String, ParseError> {
        match &self.tok.kind {
            TokenKind::Name { text, .. } | TokenKind::TypeName { text, .. } => {
                let name = text.clone();
                self.bump()?;
                Ok(name)
            }
            TokenKind::Complete { text } => {
                let name = text.clone();
                self.completion = Some(CompletionPoint {
                    text: name.clone(),
                    kind: CompletionKind::Field,
                });
                self.bump()?;
                Ok(name)
            }
            _ => Err(self.syntax_error()),
        }
    }

    fn parse_primary(&mut self) -> Result<Operation, ParseError> {
        let tok = self.bump()?;
        match tok.kind {
            TokenKind::Int { value, ty } => Ok(Operation::IntLiteral { ty, value }),
            TokenKind::Float { value, ty } => Ok(Operation::FloatLiteral { ty, value }),
            TokenKind::Imaginary { value, ty } => Ok(Operation::ComplexLiteral {
                ty,
                re: 0.0,
                im: value,
            }),
            TokenKind::CharLit { encoding, value } => {
                Ok(Operation::CharLiteral { encoding, value })
            }
            TokenKind::String {
                mut encoding,
                mut bytes,
            } => {
                // adjacent string literals concatenate
                use crate::types::CharEncoding;
                while let TokenKind::String {
                    encoding: next_enc,
                    bytes: next_bytes,
                } = &self.tok.kind
                {
                    let merged = match (encoding, *next_enc) {
                        (a, b) if a == b => a,
                        (CharEncoding::Narrow, other) => other,
                        (other, CharEncoding::Narrow) => other,
                        _ => {
                            return Err(ParseError::semantic(
                                "Undefined string concatenation.",
                            ))
                        }
                    };
                    encoding = merged;
                    bytes.extend_from_slice(next_bytes);
                    self.bump()?;
                }
                Ok(Operation::StringLiteral { encoding, bytes })
            }
            TokenKind::Keyword(Kw::True) => Ok(Operation::BoolLiteral { value: true }),
            TokenKind::Keyword(Kw::False) => Ok(Operation::BoolLiteral { value: false }),
            TokenKind::Keyword(Kw::This) => Ok(Operation::SelfRef),
            TokenKind::Name {
                text,
                symbol,
                is_field_of_this,
            } => {
                if is_field_of_this {
                    return Ok(Operation::FieldAccess {
                        base: Box::new(Operation::SelfRef),
                        field: text,
                        through_pointer: false,
                    });
                }
                match symbol {
                    Some(sym) => Ok(Operation::Variable { symbol: sym }),
                    None => Ok(Operation::NamedVariable { name: text }),
                }
            }
            TokenKind::TypeName { text, ty } => self.parse_type_primary(text, ty),
            TokenKind::BlockName { text, .. } => {
                if self.eat(&TokenKind::ColonColon)? {
                    let member = self.parse_member_name()?;
                    Ok(Operation::NamedVariable {
                        name: format!("{}::{}", text, member),
                    })
                } else {
                    Ok(Operation::NamedVariable { name: text })
                }
            }
            TokenKind::FileName { text } => {
                if self.eat(&TokenKind::ColonColon)? {
                    let member = self.parse_member_name()?;
                    Ok(Operation::NamedVariable { name: member })
                } else {
                    Ok(Operation::NamedVariable { name: text })
                }
            }
            TokenKind::ColonColon if self.dialect.has_scope_operator() => {
                // globally-qualified name
                let member = self.parse_member_name()?;
                Ok(Operation::NamedVariable { name: member })
            }
            TokenKind::Complete { text } => {
                self.completion = Some(CompletionPoint {
                    text: text.clone(),
                    kind: CompletionKind::Name,
                });
                Ok(Operation::NamedVariable { name: text })
            }
            _ => {
                // restore the token so the error names the right spot
                let err_tok = tok;
                let src = self.lexer.source();
                let at = err_tok.start.min(src.len());
                Err(ParseError::syntax(src[at..].trim().to_string()))
            }
        }
    }

    /// A type name in expression position: scope access, Go-style
    /// conversion, template instance, or the type itself as a value.
    fn parse_type_primary(&mut self, text: String, ty: Type) -> Result<Operation, ParseError> {
        if self.dialect.has_scope_operator() && self.eat(&TokenKind::ColonColon)? {
            let member = self.parse_member_name()?;
            return Ok(Operation::ScopeAccess { ty, member });
        }
        if self.kind == DialectKind::Go && matches!(self.tok.kind, TokenKind::LParen) {
            // Go conversion: T(expr)
            self.bump()?;
            let operand = self.parse_prec(Prec::Comma)?;
            self.expect(&TokenKind::RParen)?;
            return Ok(Operation::Cast {
                kind: CastKind::CStyle,
                ty,
                operand: Box::new(operand),
            });
        }
        if let Some(open) = text.find('<') {
            let name = text[..open].to_string();
            let args = self.template_args(&text[open..]);
            return Ok(Operation::TypeInstance { name, args, ty });
        }
        Ok(Operation::TypeLiteral { ty })
    }

    /// Best-effort resolution of the argument list of a collapsed
    /// template type name ("<int, long>").
    fn template_args(&self, tail: &str) -> Vec<Type> {
        let inner = tail.trim_start_matches('<').trim_end_matches('>');
        let mut args = Vec::new();
        for part in inner.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            if let Some(ty) = self.provider.lookup_type(part, self.scope) {
                args.push(ty);
            } else if let Some(ty) = builtin_type_named(part) {
                args.push(ty);
            }
        }
        args
    }

    // ---- type names -------------------------------------------------

    /// Whether the current token can start a type-name.
    fn starts_type(&self) -> bool {
        match &self.tok.kind {
            TokenKind::TypeName { .. } => true,
            TokenKind::Keyword(kw) => matches!(
                kw,
                Kw::Void
                    | Kw::Bool
                    | Kw::Char
                    | Kw::Short
                    | Kw::Int
                    | Kw::Long
                    | Kw::Signed
                    | Kw::Unsigned
                    | Kw::Float
                    | Kw::Double
                    | Kw::Complex
                    | Kw::Struct
                    | Kw::Union
                    | Kw::Enum
                    | Kw::Class
                    | Kw::Const
                    | Kw::Volatile
                    | Kw::Restrict
                    | Kw::Atomic
            ),
            _ => false,
        }
    }

    /// Parse a full type-name: specifier plus abstract declarator, with
    /// the modifiers folded through the type stack.
    fn parse_type_name(&mut self) -> Result<Type, ParseError> {
        let base = self.parse_type_specifier()?;
        let saved = std::mem::take(&mut self.type_stack);
        let result: Result<Type, ParseError> = (|| {
            let stack = self.parse_abs_declarator()?;
            self.type_stack = stack;
            let ty = self.type_stack.follow(base)?;
            self.type_stack.check_drained()?;
            Ok(ty)
        })();
        self.type_stack = saved;
        result
    }

    fn parse_type_specifier(&mut self) -> Result<Type, ParseError> {
        // leading qualifiers bind to the base type
        let mut quals: Vec<TypeQual> = Vec::new();
        loop {
            match &self.tok.kind {
                TokenKind::Keyword(Kw::Const) => {
                    self.bump()?;
                    quals.push(TypeQual::Const);
                }
                TokenKind::Keyword(Kw::Volatile) => {
                    self.bump()?;
                    quals.push(TypeQual::Volatile);
                }
                TokenKind::Keyword(Kw::Restrict) => {
                    self.bump()?;
                    quals.push(TypeQual::Restrict);
                }
                TokenKind::Keyword(Kw::Atomic) => {
                    self.bump()?;
                    quals.push(TypeQual::Atomic);
                }
                _ => break,
            }
        }

        let mut base = match &self.tok.kind {
            TokenKind::TypeName { ty, .. } => {
                let ty = ty.clone();
                self.bump()?;
                ty
            }
            TokenKind::Keyword(Kw::Struct | Kw::Union | Kw::Class | Kw::Enum) => {
                self.bump()?;
                let name = match &self.tok.kind {
                    TokenKind::Name { text, .. } | TokenKind::TypeName { text, .. } => {
                        text.clone()
                    }
                    _ => return Err(self.syntax_error()),
                };
                self.bump()?;
                match self.provider.lookup_type(&name, self.scope) {
                    Some(ty) => ty,
                    None => {
                        return Err(ParseError::semantic(format!(
                            "No struct type named {}.",
                            name
                        )))
                    }
                }
            }
            TokenKind::Keyword(_) => self.parse_builtin_specifier()?,
            _ => return Err(self.syntax_error()),
        };

        // trailing qualifiers ("int const")
        loop {
            match &self.tok.kind {
                TokenKind::Keyword(Kw::Const) => {
                    self.bump()?;
                    quals.push(TypeQual::Const);
                }
                TokenKind::Keyword(Kw::Volatile) => {
                    self.bump()?;
                    quals.push(TypeQual::Volatile);
                }
                _ => break,
            }
        }
        for q in quals {
            base = Type::qualified(q, base);
        }
        Ok(base)
    }

    /// The `unsigned long long int`-style builtin specifier combos.
    fn parse_builtin_specifier(&mut self) -> Result<Type, ParseError> {
        let mut signed: Option<bool> = None;
        let mut longs = 0u32;
        let mut short = false;
        let mut complex = false;
        let mut base: Option<Kw> = None;

        loop {
            let kw = match &self.tok.kind {
                TokenKind::Keyword(kw) => *kw,
                _ => break,
            };
            match kw {
                Kw::Signed => {
                    self.bump()?;
                    signed = Some(true);
                }
                Kw::Unsigned => {
                    self.bump()?;
                    signed = Some(false);
                }
                Kw::Long => {
                    self.bump()?;
                    longs += 1;
                }
                Kw::Short => {
                    self.bump()?;
                    short = true;
                }
                Kw::Complex => {
                    self.bump()?;
                    complex = true;
                }
                Kw::Void | Kw::Bool | Kw::Char | Kw::Int | Kw::Float | Kw::Double => {
                    self.bump()?;
                    if base.is_some() {
                        return Err(ParseError::semantic("Duplicate type specifier."));
                    }
                    base = Some(kw);
                }
                _ => break,
            }
        }

        let ty = match base {
            Some(Kw::Void) => {
                if signed.is_some() || longs > 0 || short {
                    return Err(ParseError::semantic(
                        "void does not combine with other specifiers.",
                    ));
                }
                Type::Void
            }
            Some(Kw::Bool) => Type::Bool,
            Some(Kw::Char) => match signed {
                Some(true) => Type::signed_char(),
                Some(false) => Type::unsigned_char(),
                None => Type::char(),
            },
            Some(Kw::Float) => Type::float(),
            Some(Kw::Double) => {
                if longs > 0 {
                    Type::long_double()
                } else {
                    Type::double()
                }
            }
            Some(Kw::Int) | None => {
                if base.is_none() && signed.is_none() && longs == 0 && !short && !complex {
                    return Err(self.syntax_error());
                }
                let unsigned = signed == Some(false);
                match (short, longs) {
                    (true, _) => {
                        if unsigned {
                            Type::unsigned_short()
                        } else {
                            Type::short()
                        }
                    }
                    (false, 0) => {
                        if unsigned {
                            Type::unsigned_int()
                        } else {
                            Type::int()
                        }
                    }
                    (false, 1) => {
                        if unsigned {
                            Type::unsigned_long()
                        } else {
                            Type::long()
                        }
                    }
                    _ => {
                        if unsigned {
                            Type::unsigned_long_long()
                        } else {
                            Type::long_long()
                        }
                    }
                }
            }
            _ => return Err(self.syntax_error()),
        };
        if complex {
            return Ok(Type::Complex {
                component: Box::new(ty),
            });
        }
        Ok(ty)
    }

    /// One level of abstract declarator, assembled so that `follow`
    /// applies suffix modifiers before prefix ones, and parenthesized
    /// groups after the suffixes of their level.
    fn parse_abs_declarator(&mut self) -> Result<TypeStack, ParseError> {
        let mut prefixes: Vec<TypeMod> = Vec::new();
        loop {
            match &self.tok.kind {
                TokenKind::Star => {
                    self.bump()?;
                    prefixes.push(TypeMod::Pointer);
                }
                TokenKind::Amp => {
                    self.bump()?;
                    prefixes.push(TypeMod::Reference { rvalue: false });
                }
                TokenKind::AndAnd => {
                    self.bump()?;
                    prefixes.push(TypeMod::Reference { rvalue: true });
                }
                TokenKind::Keyword(Kw::Const) => {
                    self.bump()?;
                    prefixes.push(TypeMod::Qualifier(TypeQual::Const));
                }
                TokenKind::Keyword(Kw::Volatile) => {
                    self.bump()?;
                    prefixes.push(TypeMod::Qualifier(TypeQual::Volatile));
                }
                TokenKind::Keyword(Kw::Restrict) => {
                    self.bump()?;
                    prefixes.push(TypeMod::Qualifier(TypeQual::Restrict));
                }
                TokenKind::Keyword(Kw::Atomic) => {
                    self.bump()?;
                    prefixes.push(TypeMod::Qualifier(TypeQual::Atomic));
                }
                TokenKind::At => {
                    // named address-space qualifier: @tag
                    self.bump()?;
                    let tag = match &self.tok.kind {
                        TokenKind::Name { text, .. } | TokenKind::TypeName { text, .. } => {
                            text.clone()
                        }
                        _ => return Err(self.syntax_error()),
                    };
                    self.bump()?;
                    prefixes.push(TypeMod::Qualifier(TypeQual::AddressSpace(tag)));
                }
                _ => break,
            }
        }

        // a parenthesis either wraps a sub-declarator or opens a
        // parameter list; a parameter list begins with a type or `)`
        let mut group: Option<TypeStack> = None;
        let mut suffixes: Vec<TypeMod> = Vec::new();
        if matches!(self.tok.kind, TokenKind::LParen) {
            self.bump()?;
            if self.starts_type() || matches!(self.tok.kind, TokenKind::RParen) {
                let params = self.parse_param_types()?;
                self.expect(&TokenKind::RParen)?;
                suffixes.push(TypeMod::FunctionWith {
                    params,
                    varargs: false,
                });
            } else {
                group = Some(self.parse_abs_declarator()?);
                self.expect(&TokenKind::RParen)?;
            }
        }
        loop {
            match &self.tok.kind {
                TokenKind::LBracket => {
                    self.bump()?;
                    let len = match &self.tok.kind {
                        TokenKind::Int { value, .. } => {
                            let n = *value;
                            self.bump()?;
                            Some(n as u64)
                        }
                        _ => None,
                    };
                    self.expect(&TokenKind::RBracket)?;
                    suffixes.push(TypeMod::ArrayOf(len));
                }
                TokenKind::LParen => {
                    self.bump()?;
                    let params = self.parse_param_types()?;
                    self.expect(&TokenKind::RParen)?;
                    suffixes.push(TypeMod::FunctionWith {
                        params,
                        varargs: false,
                    });
                }
                _ => break,
            }
        }

        let mut stack = TypeStack::new();
        if let Some(g) = group {
            stack.push_stack(g);
        }
        for s in suffixes {
            stack.push(s);
        }
        for p in prefixes.into_iter().rev() {
            stack.push(p);
        }
        Ok(stack)
    }

    fn parse_param_types(&mut self) -> Result<Vec<Type>, ParseError> {
        let mut params = Vec::new();
        if matches!(self.tok.kind, TokenKind::RParen) {
            return Ok(params);
        }
        loop {
            params.push(self.parse_type_name()?);
            if !self.eat(&TokenKind::Comma)? {
                break;
            }
        }
        if params.len() == 1 && matches!(params[0], Type::Void) {
            params.clear();
        } else if params.iter().any(|t| matches!(t, Type::Void)) {
            return Err(ParseError::semantic(
                "void is only allowed as a sole parameter.",
            ));
        }
        Ok(params)
    }
}

fn next_tighter(p: Prec) -> Prec {
    use Prec::*;
    match p {
        Comma => Assign,
        Assign => Ternary,
        Ternary => LogicalOr,
        LogicalOr => LogicalAnd,
        LogicalAnd => BitOr,
        BitOr => BitXor,
        BitXor => BitAnd,
        BitAnd => Equality,
        Equality => Relational,
        Relational => Shift,
        Shift => Additive,
        Additive => Multiplicative,
        Multiplicative => Unary,
        Unary => Postfix,
        Postfix | Primary => Primary,
    }
}

fn binary_op(kind: &TokenKind) -> Option<(BinaryOpcode, Prec)> {
    use BinaryOpcode::*;
    let r = match kind {
        TokenKind::OrOr => (LogicalOr, Prec::LogicalOr),
        TokenKind::AndAnd => (LogicalAnd, Prec::LogicalAnd),
        TokenKind::Pipe => (BitOr, Prec::BitOr),
        TokenKind::Caret => (BitXor, Prec::BitXor),
        TokenKind::Amp => (BitAnd, Prec::BitAnd),
        TokenKind::EqEq => (Eq, Prec::Equality),
        TokenKind::NotEq => (NotEq, Prec::Equality),
        TokenKind::Less => (Lt, Prec::Relational),
        TokenKind::Greater => (Gt, Prec::Relational),
        TokenKind::Le => (Le, Prec::Relational),
        TokenKind::Ge => (Ge, Prec::Relational),
        TokenKind::Shl => (Shl, Prec::Shift),
        TokenKind::Shr => (Shr, Prec::Shift),
        TokenKind::Plus => (Add, Prec::Additive),
        TokenKind::Minus => (Sub, Prec::Additive),
        TokenKind::Star => (Mul, Prec::Multiplicative),
        TokenKind::Slash => (Div, Prec::Multiplicative),
        TokenKind::Percent => (Rem, Prec::Multiplicative),
        _ => return None,
    };
    Some(r)
}

fn assign_modify_op(kind: &TokenKind) -> Option<BinaryOpcode> {
    use BinaryOpcode::*;
    let r = match kind {
        TokenKind::PlusAssign => Add,
        TokenKind::MinusAssign => Sub,
        TokenKind::StarAssign => Mul,
        TokenKind::SlashAssign => Div,
        TokenKind::PercentAssign => Rem,
        TokenKind::AmpAssign => BitAnd,
        TokenKind::PipeAssign => BitOr,
        TokenKind::CaretAssign => BitXor,
        TokenKind::ShlAssign => Shl,
        TokenKind::ShrAssign => Shr,
        _ => return None,
    };
    Some(r)
}

/// Builtin type spellings usable inside template argument lists.
fn builtin_type_named(name: &str) -> Option<Type> {
    let ty = match name {
        "void" => Type::Void,
        "bool" => Type::Bool,
        "char" => Type::char(),
        "short" => Type::short(),
        "int" => Type::int(),
        "long" => Type::long(),
        "unsigned" | "unsigned int" => Type::unsigned_int(),
        "unsigned long" => Type::unsigned_long(),
        "float" => Type::float(),
        "double" => Type::double(),
        _ => return None,
    };
    Some(ty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::StaticProvider;

    fn parse(src: &str) -> Result<ParsedExpression, ParseError> {
        let p = StaticProvider::new(0x1000, 16);
        parse_expression(src, DialectKind::C, &p, None)
    }

    #[test]
    fn builds_a_left_leaning_tree_for_left_assoc_ops() {
        let t = parse("1 - 2 - 3").unwrap();
        match t.root {
            Operation::Binary { op: BinaryOpcode::Sub, left, .. } => {
                assert!(matches!(*left, Operation::Binary { op: BinaryOpcode::Sub, .. }));
            }
            other => panic!("unexpected root {:?}", other),
        }
    }

    #[test]
    fn assignment_is_right_associative() {
        let t = parse("a = b = c").unwrap();
        match t.root {
            Operation::Assign { value, .. } => {
                assert!(matches!(*value, Operation::Assign { .. }));
            }
            other => panic!("unexpected root {:?}", other),
        }
    }

    #[test]
    fn cast_binds_tighter_than_binary() {
        // (int) x + 1 is ((int) x) + 1
        let t = parse("(int) x + 1").unwrap();
        assert!(matches!(t.root, Operation::Binary { op: BinaryOpcode::Add, .. }));
    }

    #[test]
    fn unsigned_long_specifier_combines() {
        let p = StaticProvider::new(0x1000, 16);
        let t = parse_expression("(unsigned long) 1", DialectKind::C, &p, None).unwrap();
        match t.root {
            Operation::Cast { ty, .. } => assert_eq!(ty.display_name(), "unsigned long"),
            other => panic!("unexpected root {:?}", other),
        }
    }

    #[test]
    fn address_space_qualifier_attaches_to_declarators() {
        let p = StaticProvider::new(0x1000, 16);
        let t = parse_expression("(int @global *) 0", DialectKind::C, &p, None).unwrap();
        match t.root {
            Operation::Cast { ty, .. } => {
                assert_eq!(ty.display_name(), "@global int *");
            }
            other => panic!("unexpected root {:?}", other),
        }
    }

    #[test]
    fn void_is_only_a_sole_parameter() {
        assert!(matches!(
            parse("sizeof(int (*)(void, int))"),
            Err(ParseError::Semantic { .. })
        ));
        assert!(parse("sizeof(int (*)(void))").is_ok());
    }

    #[test]
    fn deep_nesting_is_bounded() {
        let src = format!("{}1{}", "(".repeat(400), ")".repeat(400));
        assert!(matches!(
            parse(&src),
            Err(ParseError::Semantic { .. })
        ));
    }
}
