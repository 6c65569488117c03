//! Token classifier / lexer.
//!
//! A hand-written lexer over a byte cursor. Operators are matched
//! longest-first (three-character, then two, then one) - that ordering
//! is a correctness requirement, not an optimization. Identifiers are
//! classified through the provider's symbol tables, with a short
//! re-lexing FIFO to collapse qualified names (`A::B`, `pkg.name`) once
//! a secondary classification decides how far they reach. Macro
//! invocations are spliced in through a single-level save/restore of
//! the cursor.

use std::collections::VecDeque;

use log::trace;

use crate::expr::error::ParseError;
use crate::expr::token::{Kw, Token, TokenKind};
use crate::lang::Dialect;
use crate::provider::{BlockId, Provider, SymbolDomain, SymbolKind};
use crate::types::{CharEncoding, Type};

/// Three-character operators, tried first.
const TOKENTAB3: &[(&str, TokenKind)] = &[
    (">>=", TokenKind::ShrAssign),
    ("<<=", TokenKind::ShlAssign),
];

/// Two-character operators, tried after the three-character table.
const TOKENTAB2: &[(&str, TokenKind)] = &[
    ("+=", TokenKind::PlusAssign),
    ("-=", TokenKind::MinusAssign),
    ("*=", TokenKind::StarAssign),
    ("/=", TokenKind::SlashAssign),
    ("%=", TokenKind::PercentAssign),
    ("|=", TokenKind::PipeAssign),
    ("&=", TokenKind::AmpAssign),
    ("^=", TokenKind::CaretAssign),
    ("++", TokenKind::Inc),
    ("--", TokenKind::Dec),
    ("->", TokenKind::Arrow),
    ("&&", TokenKind::AndAnd),
    ("||", TokenKind::OrOr),
    ("::", TokenKind::ColonColon),
    ("<<", TokenKind::Shl),
    (">>", TokenKind::Shr),
    ("==", TokenKind::EqEq),
    ("!=", TokenKind::NotEq),
    ("<=", TokenKind::Le),
    (">=", TokenKind::Ge),
];

/// State of a spliced macro expansion: the expansion text plus where to
/// resume in the original input. Only one level is ever active.
struct Expansion {
    text: String,
    pos: usize,
    invocation_start: usize,
}

pub struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    dialect: &'static dyn Dialect,
    provider: &'a dyn Provider,
    scope: Option<BlockId>,
    /// Re-lexed tokens waiting to be handed out, in source order.
    fifo: VecDeque<Token>,
    expansion: Option<Expansion>,
    completion_mode: bool,
    completion_emitted: bool,
    last_was_structop: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(
        src: &'a str,
        dialect: &'static dyn Dialect,
        provider: &'a dyn Provider,
        scope: Option<BlockId>,
    ) -> Lexer<'a> {
        Lexer {
            src,
            pos: 0,
            dialect,
            provider,
            scope,
            fifo: VecDeque::new(),
            expansion: None,
            completion_mode: false,
            completion_emitted: false,
            last_was_structop: false,
        }
    }

    /// Ask for a completion-point token instead of plain end-of-input
    /// when the input stops at a name or after `.`/`->`.
    pub fn enable_completion(&mut self) {
        self.completion_mode = true;
    }

    pub fn source(&self) -> &'a str {
        self.src
    }

    pub fn next_token(&mut self) -> Result<Token, ParseError> {
        let tok = match self.fifo.pop_front() {
            Some(t) => t,
            None => self.lex_one()?,
        };
        self.last_was_structop =
            matches!(tok.kind, TokenKind::Dot | TokenKind::Arrow);
        Ok(tok)
    }

    // ---- cursor ----------------------------------------------------

    fn overlay(&self) -> (&str, usize) {
        match &self.expansion {
            Some(e) => (e.text.as_str(), e.pos),
            None => (self.src, self.pos),
        }
    }

    fn rest(&self) -> &str {
        let (text, pos) = self.overlay();
        &text[pos..]
    }

    fn cur(&self) -> Option<u8> {
        self.rest().as_bytes().first().copied()
    }

    fn peek(&self, n: usize) -> Option<u8> {
        self.rest().as_bytes().get(n).copied()
    }

    fn advance(&mut self, n: usize) {
        match &mut self.expansion {
            Some(e) => e.pos += n,
            None => self.pos += n,
        }
    }

    /// Span position in the original input for the token being built.
    fn span_pos(&self) -> usize {
        match &self.expansion {
            Some(e) => e.invocation_start,
            None => self.pos,
        }
    }

    fn save_cursor(&self) -> (usize, usize) {
        (self.pos, self.expansion.as_ref().map_or(0, |e| e.pos))
    }

    fn restore_cursor(&mut self, saved: (usize, usize)) {
        self.pos = saved.0;
        if let Some(e) = &mut self.expansion {
            e.pos = saved.1;
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.cur() {
            if c == b' ' || c == b'\t' || c == b'\n' || c == b'\r' {
                self.advance(1);
            } else {
                break;
            }
        }
    }

    /// True when the cursor sits at the very end of the original input
    /// (never inside a macro expansion).
    fn at_physical_end(&self) -> bool {
        self.expansion.is_none() && self.pos >= self.src.len()
    }

    // ---- main scanner ----------------------------------------------

    fn lex_one(&mut self) -> Result<Token, ParseError> {
        loop {
            self.skip_whitespace();
            if self.rest().is_empty() {
                if let Some(e) = self.expansion.take() {
                    // end of expansion: the cursor restore happened when
                    // the expansion was entered; just drop the overlay
                    trace!("macro expansion drained at {}", e.invocation_start);
                    continue;
                }
                // true end of input
                if self.completion_mode && !self.completion_emitted && self.last_was_structop {
                    self.completion_emitted = true;
                    let p = self.src.len();
                    return Ok(Token::new(
                        TokenKind::Complete {
                            text: String::new(),
                        },
                        p,
                        p,
                    ));
                }
                let p = self.src.len();
                return Ok(Token::new(TokenKind::End, p, p));
            }
            break;
        }

        let start = self.span_pos();
        let rest = self.rest();

        // operators, longest match first
        for (text, kind) in TOKENTAB3 {
            if rest.starts_with(text) {
                self.advance(3);
                return Ok(Token::new(kind.clone(), start, start + 3));
            }
        }
        for (text, kind) in TOKENTAB2 {
            if rest.starts_with(text) {
                self.advance(2);
                return Ok(Token::new(kind.clone(), start, start + 2));
            }
        }

        let c = rest.as_bytes()[0];

        // numbers: a digit, or '.' followed by a digit
        if c.is_ascii_digit() || (c == b'.' && self.peek(1).is_some_and(|d| d.is_ascii_digit())) {
            return self.scan_number(start);
        }

        // string/char literals, with optional encoding prefix
        if let Some((encoding, skip, quote)) = self.literal_prefix() {
            self.advance(skip);
            return match quote {
                b'"' => self.scan_string(start, encoding),
                _ => self.scan_char(start, encoding),
            };
        }

        // Go raw strings
        if c == b'`' && self.dialect.has_raw_strings() {
            return self.scan_raw_string(start);
        }

        if c == b'_' || c.is_ascii_alphabetic() {
            return self.scan_identifier(start);
        }

        let one = match c {
            b'+' => Some(TokenKind::Plus),
            b'-' => Some(TokenKind::Minus),
            b'*' => Some(TokenKind::Star),
            b'/' => Some(TokenKind::Slash),
            b'%' => Some(TokenKind::Percent),
            b'&' => Some(TokenKind::Amp),
            b'|' => Some(TokenKind::Pipe),
            b'^' => Some(TokenKind::Caret),
            b'~' => Some(TokenKind::Tilde),
            b'!' => Some(TokenKind::Bang),
            b'<' => Some(TokenKind::Less),
            b'>' => Some(TokenKind::Greater),
            b'=' => Some(TokenKind::Assign),
            b'?' => Some(TokenKind::Question),
            b':' => Some(TokenKind::Colon),
            b',' => Some(TokenKind::Comma),
            b'.' => Some(TokenKind::Dot),
            b'@' => Some(TokenKind::At),
            b'(' => Some(TokenKind::LParen),
            b')' => Some(TokenKind::RParen),
            b'[' => Some(TokenKind::LBracket),
            b']' => Some(TokenKind::RBracket),
            b'{' => Some(TokenKind::LBrace),
            b'}' => Some(TokenKind::RBrace),
            _ => None,
        };
        match one {
            Some(kind) => {
                self.advance(1);
                Ok(Token::new(kind, start, start + 1))
            }
            None => Err(ParseError::lexical(format!(
                "Invalid character '{}' in expression.",
                c as char
            ))),
        }
    }

    /// Encoding prefix of a string/char literal at the cursor, if the
    /// cursor is at one: (encoding, bytes to skip up to and including
    /// the quote, the quote character).
    fn literal_prefix(&self) -> Option<(CharEncoding, usize, u8)> {
        let rest = self.rest().as_bytes();
        let check = |encoding: CharEncoding, at: usize| -> Option<(CharEncoding, usize, u8)> {
            match rest.get(at) {
                Some(&q @ (b'"' | b'\'')) => Some((encoding, at + 1, q)),
                _ => None,
            }
        };
        match rest.first()? {
            b'"' | b'\'' => check(CharEncoding::Narrow, 0),
            b'L' => check(CharEncoding::Wide, 1),
            b'U' => check(CharEncoding::Utf32, 1),
            b'u' => {
                if rest.get(1) == Some(&b'8') {
                    check(CharEncoding::Narrow, 2)
                } else {
                    check(CharEncoding::Utf16, 1)
                }
            }
            _ => None,
        }
    }

    // ---- numbers ---------------------------------------------------

    fn scan_number(&mut self, start: usize) -> Result<Token, ParseError> {
        let radix = self.provider.current_radix();
        let rest = self.rest();
        let bytes = rest.as_bytes();
        let prefix_hex = rest.starts_with("0x") || rest.starts_with("0X");
        // in radix 16, 'e' and 'f' are digits and exponents do not exist
        let hex = prefix_hex || radix > 10;

        let mut p = 0;
        let mut got_dot = false;
        let mut got_e = false;
        while p < bytes.len() {
            let b = bytes[p];
            if !hex && !got_e && (b == b'e' || b == b'E') {
                got_e = true;
                p += 1;
                if matches!(bytes.get(p), Some(b'+') | Some(b'-')) {
                    p += 1;
                }
            } else if b == b'.' && !got_dot {
                got_dot = true;
                p += 1;
            } else if b.is_ascii_alphanumeric() {
                p += 1;
            } else {
                break;
            }
        }
        let text = &rest[..p];
        let kind = parse_number(text, got_dot || got_e, radix, self.dialect)?;
        self.advance(p);
        Ok(Token::new(kind, start, start + p))
    }

    // ---- strings and characters ------------------------------------

    fn scan_string(&mut self, start: usize, encoding: CharEncoding) -> Result<Token, ParseError> {
        let mut buf: Vec<u8> = Vec::new();
        loop {
            let c = self
                .cur()
                .ok_or_else(|| ParseError::lexical("Unterminated string in expression."))?;
            self.advance(1);
            match c {
                b'"' => break,
                b'\\' => self.scan_escape(&mut buf)?,
                other => buf.push(other),
            }
        }
        let end = self.span_pos();
        Ok(Token::new(
            TokenKind::String {
                encoding,
                bytes: buf,
            },
            start,
            end.max(start),
        ))
    }

    fn scan_raw_string(&mut self, start: usize) -> Result<Token, ParseError> {
        self.advance(1); // opening backquote
        let mut buf = Vec::new();
        loop {
            let c = self
                .cur()
                .ok_or_else(|| ParseError::lexical("Unterminated raw string in expression."))?;
            self.advance(1);
            if c == b'`' {
                break;
            }
            buf.push(c);
        }
        let end = self.span_pos();
        Ok(Token::new(
            TokenKind::String {
                encoding: CharEncoding::Narrow,
                bytes: buf,
            },
            start,
            end.max(start),
        ))
    }

    fn scan_char(&mut self, start: usize, encoding: CharEncoding) -> Result<Token, ParseError> {
        let mut buf: Vec<u8> = Vec::new();
        loop {
            let c = self
                .cur()
                .ok_or_else(|| ParseError::lexical("Unterminated character constant."))?;
            self.advance(1);
            match c {
                b'\'' => break,
                b'\\' => self.scan_escape(&mut buf)?,
                other => buf.push(other),
            }
        }
        let decoded = crate::value::decode_escapes(&buf, encoding);
        if decoded.is_empty() {
            return Err(ParseError::lexical("Empty character constant."));
        }
        // one code unit; longer sequences are multi-character constants
        let value = if decoded.len() == 1 {
            i128::from(decoded[0] as i8)
        } else if let Ok(text) = std::str::from_utf8(&decoded) {
            let mut chars = text.chars();
            match (chars.next(), chars.next()) {
                (Some(first), None) => i128::from(first as u32),
                _ => return Err(ParseError::lexical("Invalid character constant.")),
            }
        } else {
            return Err(ParseError::lexical("Invalid character constant."));
        };
        let end = self.span_pos();
        Ok(Token::new(
            TokenKind::CharLit { encoding, value },
            start,
            end.max(start),
        ))
    }

    /// Process one backslash escape (the backslash is consumed). Simple
    /// escapes resolve to a byte; hex, octal and universal-character
    /// escapes are passed through verbatim for the later decode stage.
    fn scan_escape(&mut self, buf: &mut Vec<u8>) -> Result<(), ParseError> {
        let c = self
            .cur()
            .ok_or_else(|| ParseError::lexical("Unterminated escape sequence."))?;
        match c {
            b'x' => {
                self.advance(1);
                if !self.cur().is_some_and(|d| (d as char).is_ascii_hexdigit()) {
                    return Err(ParseError::lexical(
                        "\\x escape without a following hex digit.",
                    ));
                }
                buf.extend_from_slice(b"\\x");
                while let Some(d) = self.cur() {
                    if (d as char).is_ascii_hexdigit() {
                        buf.push(d);
                        self.advance(1);
                    } else {
                        break;
                    }
                }
            }
            b'0'..=b'7' => {
                buf.push(b'\\');
                let mut n = 0;
                while n < 3 {
                    match self.cur() {
                        Some(d @ b'0'..=b'7') => {
                            buf.push(d);
                            self.advance(1);
                            n += 1;
                        }
                        _ => break,
                    }
                }
            }
            b'u' | b'U' => {
                let want = if c == b'u' { 4 } else { 8 };
                self.advance(1);
                buf.push(b'\\');
                buf.push(c);
                for _ in 0..want {
                    match self.cur() {
                        Some(d) if (d as char).is_ascii_hexdigit() => {
                            buf.push(d);
                            self.advance(1);
                        }
                        _ => {
                            return Err(ParseError::lexical(format!(
                                "\\{} escape with too few hex digits.",
                                c as char
                            )))
                        }
                    }
                }
            }
            simple => {
                self.advance(1);
                let resolved = match simple {
                    b'n' => b'\n',
                    b't' => b'\t',
                    b'r' => b'\r',
                    b'b' => 8,
                    b'f' => 12,
                    b'v' => 11,
                    b'a' => 7,
                    b'e' => 27,
                    other => other,
                };
                buf.push(resolved);
            }
        }
        Ok(())
    }

    // ---- identifiers and classification ----------------------------

    fn scan_raw_word(&mut self) -> String {
        let rest = self.rest();
        let bytes = rest.as_bytes();
        let mut p = 0;
        while p < bytes.len() && (bytes[p] == b'_' || bytes[p].is_ascii_alphanumeric()) {
            p += 1;
        }
        let word = rest[..p].to_string();
        self.advance(p);
        word
    }

    fn scan_identifier(&mut self, start: usize) -> Result<Token, ParseError> {
        let word = self.scan_raw_word();

        // completion point: input ends exactly at this name
        if self.completion_mode && self.at_physical_end() {
            self.completion_emitted = true;
            return Ok(Token::new(
                TokenKind::Complete { text: word },
                start,
                self.src.len(),
            ));
        }

        // macro invocation: splice the expansion in, one level deep
        if self.expansion.is_none() {
            if let Some(text) = self.provider.expand_macro(&word) {
                trace!("splicing macro {} -> {:?}", word, text);
                self.expansion = Some(Expansion {
                    text,
                    pos: 0,
                    invocation_start: start,
                });
                return self.lex_one();
            }
        }

        // keywords; shadowable ones lose to a live symbol
        if let Some((kw, shadowable)) = self.dialect.keyword(&word) {
            let shadowed = shadowable && {
                let lk = self
                    .provider
                    .lookup_symbol(&word, self.scope, SymbolDomain::Var);
                lk.symbol.is_some() || lk.is_field_of_this
            };
            if !shadowed {
                let end = start + word.len();
                return Ok(Token::new(TokenKind::Keyword(kw), start, end));
            }
        }

        let end = start + word.len();

        // template-argument tail: `name<...>` that names a type
        if self.dialect.has_named_casts() && self.cur() == Some(b'<') {
            if let Some(tok) = self.try_template_tail(&word, start) {
                return Ok(tok);
            }
        }

        let kind = self.classify_word(&word);

        // qualified-name lookahead
        match &kind {
            TokenKind::TypeName { text, ty } if self.dialect.has_scope_operator() => {
                let (text, ty) = (text.clone(), ty.clone());
                let tok = self.extend_scoped_name(text, ty, start)?;
                return Ok(tok);
            }
            TokenKind::Name { symbol, text, .. }
                if matches!(
                    symbol.as_ref().map(|s| &s.kind),
                    Some(SymbolKind::Scope)
                ) && !self.dialect.has_scope_operator() =>
            {
                let text = text.clone();
                let tok = self.extend_package_name(text, start)?;
                return Ok(tok);
            }
            _ => {}
        }

        Ok(Token::new(kind, start, end))
    }

    /// Plain classification of one word through the provider.
    fn classify_word(&self, word: &str) -> TokenKind {
        if let Some(ty) = self.provider.lookup_type(word, self.scope) {
            trace!("classified {} as type name", word);
            return TokenKind::TypeName {
                text: word.to_string(),
                ty,
            };
        }
        let lookup = self
            .provider
            .lookup_symbol(word, self.scope, SymbolDomain::Var);
        if let Some(sym) = &lookup.symbol {
            match &sym.kind {
                SymbolKind::Typedef { ty } => {
                    return TokenKind::TypeName {
                        text: word.to_string(),
                        ty: ty.clone(),
                    }
                }
                SymbolKind::Block { id } => {
                    return TokenKind::BlockName {
                        text: word.to_string(),
                        block: *id,
                    }
                }
                SymbolKind::File => {
                    return TokenKind::FileName {
                        text: word.to_string(),
                    }
                }
                _ => {}
            }
        }
        TokenKind::Name {
            text: word.to_string(),
            symbol: lookup.symbol,
            is_field_of_this: lookup.is_field_of_this,
        }
    }

    /// Attempt to extend `word` with a balanced `<...>` template tail
    /// naming a type. The cursor is restored on failure.
    fn try_template_tail(&mut self, word: &str, start: usize) -> Option<Token> {
        let saved = self.save_cursor();
        let rest = self.rest();
        let bytes = rest.as_bytes();
        let mut depth = 0usize;
        let mut p = 0;
        while p < bytes.len() && p < 256 {
            match bytes[p] {
                b'<' => depth += 1,
                b'>' => {
                    depth -= 1;
                    if depth == 0 {
                        p += 1;
                        let candidate = format!("{}{}", word, &rest[..p]);
                        if let Some(ty) = self.provider.lookup_type(&candidate, self.scope) {
                            self.advance(p);
                            return Some(Token::new(
                                TokenKind::TypeName {
                                    text: candidate,
                                    ty,
                                },
                                start,
                                start + word.len() + p,
                            ));
                        }
                        self.restore_cursor(saved);
                        return None;
                    }
                }
                b';' | b'(' | b')' => break,
                _ => {}
            }
            p += 1;
        }
        self.restore_cursor(saved);
        None
    }

    /// Secondary classification for `Type::name::...`: buffer the
    /// following `::`/name pairs, collapse those that still name nested
    /// types into the current token, and leave the first non-matching
    /// pair in the FIFO. Replay order always equals source order.
    fn extend_scoped_name(
        &mut self,
        mut text: String,
        mut ty: Type,
        start: usize,
    ) -> Result<Token, ParseError> {
        loop {
            let saved = self.save_cursor();
            self.skip_whitespace();
            if !self.rest().starts_with("::") {
                self.restore_cursor(saved);
                break;
            }
            let colon_pos = self.span_pos();
            self.advance(2);
            self.skip_whitespace();
            let word_pos = self.span_pos();
            if !self
                .cur()
                .is_some_and(|c| c == b'_' || c.is_ascii_alphabetic())
            {
                self.restore_cursor(saved);
                break;
            }
            let word = self.scan_raw_word();
            let candidate = format!("{}::{}", text, word);
            if let Some(nested) = self.provider.lookup_type(&candidate, self.scope) {
                trace!("collapsed qualified type name {}", candidate);
                text = candidate;
                ty = nested;
                continue;
            }
            // not a nested type: emit the buffered tokens unchanged
            self.fifo.push_back(Token::new(
                TokenKind::ColonColon,
                colon_pos,
                colon_pos + 2,
            ));
            let trailing = if self.completion_mode && self.at_physical_end() {
                self.completion_emitted = true;
                TokenKind::Complete { text: word.clone() }
            } else {
                self.classify_word(&word)
            };
            self.fifo
                .push_back(Token::new(trailing, word_pos, word_pos + word.len()));
            break;
        }
        let end = start + text.len();
        Ok(Token::new(TokenKind::TypeName { text, ty }, start, end))
    }

    /// `pkg.name` collapsing for dialects without `::`.
    fn extend_package_name(&mut self, mut text: String, start: usize) -> Result<Token, ParseError> {
        loop {
            let saved = self.save_cursor();
            self.skip_whitespace();
            if self.cur() != Some(b'.') {
                self.restore_cursor(saved);
                break;
            }
            let dot_pos = self.span_pos();
            self.advance(1);
            self.skip_whitespace();
            let word_pos = self.span_pos();
            if !self
                .cur()
                .is_some_and(|c| c == b'_' || c.is_ascii_alphabetic())
            {
                self.restore_cursor(saved);
                break;
            }
            let word = self.scan_raw_word();
            let candidate = format!("{}.{}", text, word);
            if let Some(ty) = self.provider.lookup_type(&candidate, self.scope) {
                return Ok(Token::new(
                    TokenKind::TypeName {
                        text: candidate.clone(),
                        ty,
                    },
                    start,
                    start + candidate.len(),
                ));
            }
            let lookup = self
                .provider
                .lookup_symbol(&candidate, self.scope, SymbolDomain::Var);
            match &lookup.symbol {
                Some(sym) if matches!(sym.kind, SymbolKind::Scope) => {
                    text = candidate;
                    continue;
                }
                Some(_) => {
                    return Ok(Token::new(
                        TokenKind::Name {
                            text: candidate.clone(),
                            symbol: lookup.symbol,
                            is_field_of_this: false,
                        },
                        start,
                        start + candidate.len(),
                    ));
                }
                None => {
                    self.fifo
                        .push_back(Token::new(TokenKind::Dot, dot_pos, dot_pos + 1));
                    let trailing = if self.completion_mode && self.at_physical_end() {
                        self.completion_emitted = true;
                        TokenKind::Complete { text: word.clone() }
                    } else {
                        self.classify_word(&word)
                    };
                    self.fifo
                        .push_back(Token::new(trailing, word_pos, word_pos + word.len()));
                    break;
                }
            }
        }
        let lookup = self
            .provider
            .lookup_symbol(&text, self.scope, SymbolDomain::Var);
        Ok(Token::new(
            TokenKind::Name {
                text: text.clone(),
                symbol: lookup.symbol,
                is_field_of_this: false,
            },
            start,
            start + text.len(),
        ))
    }
}

// ---- numeric literal parsing --------------------------------------

/// Parse the text of a numeric literal into a typed token. `parsed_float`
/// reports whether the scanner saw a decimal point or an exponent.
///
/// Integer typing picks the narrowest of int / long / long long that
/// fits, signed first, with `u`/`l`/`ll` suffixes forcing a floor.
pub fn parse_number(
    text: &str,
    parsed_float: bool,
    radix: u32,
    dialect: &dyn Dialect,
) -> Result<TokenKind, ParseError> {
    if parsed_float {
        return parse_float(text);
    }

    let mut body = text;
    let mut base = radix;

    let bytes = text.as_bytes();
    if bytes.first() == Some(&b'0') && bytes.len() > 1 {
        match bytes[1] {
            b'x' | b'X' if bytes.len() >= 3 => {
                base = 16;
                body = &text[2..];
            }
            b'b' | b'B' if bytes.len() >= 3 => {
                base = 2;
                body = &text[2..];
            }
            b't' | b'T' | b'd' | b'D' if bytes.len() >= 3 => {
                base = 10;
                body = &text[2..];
            }
            _ => {
                base = 8;
            }
        }
    }

    let mut n: u128 = 0;
    let mut long_p = 0u32;
    let mut unsigned_p = false;
    let mut found_suffix = false;
    let mut imaginary = false;

    let chars: Vec<char> = body.chars().collect();
    for (idx, raw) in chars.iter().enumerate() {
        let c = raw.to_ascii_lowercase();
        if c == 'l' {
            long_p += 1;
            found_suffix = true;
            continue;
        }
        if c == 'u' {
            unsigned_p = true;
            found_suffix = true;
            continue;
        }
        if c == 'i' && idx == chars.len() - 1 && base <= 10 {
            imaginary = true;
            found_suffix = true;
            continue;
        }
        let digit = c
            .to_digit(36)
            .filter(|&d| d < base)
            .ok_or_else(|| ParseError::lexical(format!("Invalid number \"{}\".", text)))?;
        if found_suffix {
            return Err(ParseError::lexical(format!("Invalid number \"{}\".", text)));
        }
        n = n
            .checked_mul(u128::from(base))
            .and_then(|v| v.checked_add(u128::from(digit)))
            .ok_or(ParseError::NumericOverflow)?;
        if n > u128::from(u64::MAX) {
            return Err(ParseError::NumericOverflow);
        }
    }
    if long_p > 2 {
        return Err(ParseError::lexical(format!("Invalid number \"{}\".", text)));
    }

    if imaginary {
        return Ok(TokenKind::Imaginary {
            value: n as f64,
            ty: Type::complex_double(),
        });
    }

    let int_bits = dialect.int_bits();
    let long_bits = dialect.long_bits();
    let ll_bits = dialect.long_long_bits();
    let fits = |bits: u32| bits >= 128 || n < (1u128 << bits);

    let (signed_ty, unsigned_ty, high_bit) = if long_p == 0 && fits(int_bits) {
        (
            Type::Int {
                name: "int".into(),
                bits: int_bits,
                signed: true,
            },
            Type::Int {
                name: "unsigned int".into(),
                bits: int_bits,
                signed: false,
            },
            1u128 << (int_bits - 1),
        )
    } else if long_p <= 1 && fits(long_bits) {
        (
            Type::long(),
            Type::unsigned_long(),
            1u128 << (long_bits - 1),
        )
    } else if fits(ll_bits) {
        (
            Type::long_long(),
            Type::unsigned_long_long(),
            1u128 << (ll_bits - 1),
        )
    } else {
        return Err(ParseError::NumericOverflow);
    };

    // a value with the chosen type's high bit set must be unsigned
    let ty = if unsigned_p || (n & high_bit) != 0 {
        unsigned_ty
    } else {
        signed_ty
    };
    Ok(TokenKind::Int {
        value: n as i128,
        ty,
    })
}

fn parse_float(text: &str) -> Result<TokenKind, ParseError> {
    let lower = text.to_ascii_lowercase();
    let bad = || ParseError::lexical(format!("Invalid number \"{}\".", text));

    // decimal floating point suffixes
    for (suffix, make) in [
        ("df", Type::decimal32 as fn() -> Type),
        ("dd", Type::decimal64),
        ("dl", Type::decimal128),
    ] {
        if let Some(mantissa) = lower.strip_suffix(suffix) {
            let value: f64 = mantissa.parse().map_err(|_| bad())?;
            return Ok(TokenKind::Float { value, ty: make() });
        }
    }

    let (mantissa, ty, imaginary) = if let Some(m) = lower.strip_suffix("if") {
        (m, Type::float(), true)
    } else if let Some(m) = lower.strip_suffix('i') {
        (m, Type::double(), true)
    } else if let Some(m) = lower.strip_suffix('f') {
        (m, Type::float(), false)
    } else if let Some(m) = lower.strip_suffix('l') {
        (m, Type::long_double(), false)
    } else {
        (lower.as_str(), Type::double(), false)
    };

    let value: f64 = mantissa.parse().map_err(|_| bad())?;
    if imaginary {
        return Ok(TokenKind::Imaginary {
            value,
            ty: Type::Complex {
                component: Box::new(ty),
            },
        });
    }
    Ok(TokenKind::Float { value, ty })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::DialectKind;
    use crate::provider::StaticProvider;

    fn lex_all(src: &str, provider: &StaticProvider) -> Vec<TokenKind> {
        let mut lx = Lexer::new(src, DialectKind::C.dialect(), provider, None);
        let mut out = Vec::new();
        loop {
            let t = lx.next_token().unwrap();
            let end = matches!(t.kind, TokenKind::End);
            out.push(t.kind);
            if end {
                break;
            }
        }
        out
    }

    fn lex1(src: &str) -> TokenKind {
        let p = StaticProvider::new(0x1000, 16);
        let mut lx = Lexer::new(src, DialectKind::C.dialect(), &p, None);
        lx.next_token().unwrap().kind
    }

    fn num(src: &str) -> (i128, String) {
        match lex1(src) {
            TokenKind::Int { value, ty } => (value, ty.display_name()),
            other => panic!("expected integer, got {:?}", other),
        }
    }

    #[test]
    fn operator_priority_three_two_one() {
        let p = StaticProvider::new(0x1000, 16);
        let toks = lex_all(">>= >> > <<= << <=", &p);
        assert_eq!(
            toks,
            vec![
                TokenKind::ShrAssign,
                TokenKind::Shr,
                TokenKind::Greater,
                TokenKind::ShlAssign,
                TokenKind::Shl,
                TokenKind::Le,
                TokenKind::End,
            ]
        );
    }

    #[test]
    fn number_bases() {
        assert_eq!(num("0x1F").0, 31);
        assert_eq!(num("0b101").0, 5);
        assert_eq!(num("0t42").0, 42);
        assert_eq!(num("017").0, 15);
        assert_eq!(num("99").0, 99);
    }

    #[test]
    fn number_fitting_is_narrowest_signed_first() {
        assert_eq!(num("1").1, "int");
        assert_eq!(num("2147483647").1, "int");
        // high bit of int set: unsigned int
        assert_eq!(num("0x80000000").1, "unsigned int");
        assert_eq!(num("4294967296").1, "long");
        assert_eq!(num("9223372036854775807").1, "long");
        assert_eq!(num("0x8000000000000000").1, "unsigned long");
    }

    #[test]
    fn number_suffixes_force_floors() {
        assert_eq!(num("1u").1, "unsigned int");
        assert_eq!(num("1l").1, "long");
        assert_eq!(num("1ul").1, "unsigned long");
        assert_eq!(num("1ll").1, "long long");
        assert_eq!(num("1ull").1, "unsigned long long");
    }

    #[test]
    fn number_overflow_is_reported() {
        let p = StaticProvider::new(0x1000, 16);
        let mut lx = Lexer::new("99999999999999999999999999", DialectKind::C.dialect(), &p, None);
        assert_eq!(lx.next_token(), Err(ParseError::NumericOverflow));
    }

    #[test]
    fn invalid_digit_for_base() {
        let p = StaticProvider::new(0x1000, 16);
        let mut lx = Lexer::new("0b102", DialectKind::C.dialect(), &p, None);
        assert!(matches!(lx.next_token(), Err(ParseError::Lexical { .. })));
    }

    #[test]
    fn floats_and_imaginary() {
        assert!(matches!(lex1("3.5"), TokenKind::Float { value, .. } if value == 3.5));
        assert!(matches!(lex1("1e3"), TokenKind::Float { value, .. } if value == 1000.0));
        assert!(
            matches!(lex1("2.5f"), TokenKind::Float { ty, .. } if ty.display_name() == "float")
        );
        assert!(matches!(lex1("1.5i"), TokenKind::Imaginary { .. }));
        assert!(
            matches!(lex1("1.5df"), TokenKind::Float { ty, .. } if ty.display_name() == "_Decimal32")
        );
    }

    #[test]
    fn input_radix_sixteen() {
        let p = StaticProvider::new(0x1000, 16);
        p.set_radix(16);
        let mut lx = Lexer::new("10", DialectKind::C.dialect(), &p, None);
        assert!(matches!(
            lx.next_token().unwrap().kind,
            TokenKind::Int { value: 16, .. }
        ));
        // 0t prefix overrides the radix back to decimal
        let mut lx = Lexer::new("0t10", DialectKind::C.dialect(), &p, None);
        assert!(matches!(
            lx.next_token().unwrap().kind,
            TokenKind::Int { value: 10, .. }
        ));
    }

    #[test]
    fn string_escapes() {
        match lex1(r#""a\n\x41""#) {
            TokenKind::String { bytes, .. } => {
                // \n resolved, \x41 passed through verbatim
                assert_eq!(bytes, b"a\n\\x41".to_vec());
            }
            other => panic!("expected string, got {:?}", other),
        }
    }

    #[test]
    fn string_encoding_prefixes() {
        assert!(
            matches!(lex1(r#"L"w""#), TokenKind::String { encoding: CharEncoding::Wide, .. })
        );
        assert!(
            matches!(lex1(r#"u"w""#), TokenKind::String { encoding: CharEncoding::Utf16, .. })
        );
        assert!(
            matches!(lex1(r#"U"w""#), TokenKind::String { encoding: CharEncoding::Utf32, .. })
        );
        assert!(
            matches!(lex1(r#"u8"w""#), TokenKind::String { encoding: CharEncoding::Narrow, .. })
        );
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let p = StaticProvider::new(0x1000, 16);
        let mut lx = Lexer::new("\"abc", DialectKind::C.dialect(), &p, None);
        assert!(matches!(lx.next_token(), Err(ParseError::Lexical { .. })));
    }

    #[test]
    fn malformed_ucn_is_an_error() {
        let p = StaticProvider::new(0x1000, 16);
        let mut lx = Lexer::new("\"\\uZZ\"", DialectKind::C.dialect(), &p, None);
        assert!(matches!(lx.next_token(), Err(ParseError::Lexical { .. })));
    }

    #[test]
    fn char_literal_values() {
        assert!(matches!(lex1("'A'"), TokenKind::CharLit { value: 65, .. }));
        assert!(matches!(lex1(r"'\n'"), TokenKind::CharLit { value: 10, .. }));
        assert!(matches!(lex1(r"'\x41'"), TokenKind::CharLit { value: 65, .. }));
    }

    #[test]
    fn identifier_classification() {
        let mut p = StaticProvider::new(0x1000, 16);
        p.define_variable("x", Type::int(), 0x1000);
        p.define_type("mytype", Type::long());
        let toks = lex_all("x mytype zz", &p);
        assert!(matches!(&toks[0], TokenKind::Name { symbol: Some(_), .. }));
        assert!(matches!(&toks[1], TokenKind::TypeName { .. }));
        assert!(matches!(&toks[2], TokenKind::Name { symbol: None, .. }));
    }

    #[test]
    fn shadowable_keyword_loses_to_symbol() {
        let mut p = StaticProvider::new(0x1000, 16);
        p.define_variable("this", Type::int(), 0x1000);
        let toks = lex_all("this", &p);
        assert!(matches!(&toks[0], TokenKind::Name { symbol: Some(_), .. }));

        let p2 = StaticProvider::new(0x1000, 16);
        let toks = lex_all("this", &p2);
        assert_eq!(toks[0], TokenKind::Keyword(Kw::This));
    }

    #[test]
    fn qualified_name_collapses_to_one_type_token() {
        let mut p = StaticProvider::new(0x1000, 16);
        p.define_type("A", Type::Struct {
            name: "A".into(),
            fields: vec![],
            superclass: None,
            size: 4,
        });
        p.define_type("A::B", Type::int());
        let toks = lex_all("A::B", &p);
        assert!(matches!(&toks[0], TokenKind::TypeName { text, .. } if text == "A::B"));
        assert_eq!(toks[1], TokenKind::End);
    }

    #[test]
    fn fifo_replays_non_matching_tail_in_source_order() {
        let mut p = StaticProvider::new(0x1000, 16);
        p.define_type("A", Type::Struct {
            name: "A".into(),
            fields: vec![],
            superclass: None,
            size: 4,
        });
        let toks = lex_all("A::member", &p);
        assert!(matches!(&toks[0], TokenKind::TypeName { text, .. } if text == "A"));
        assert_eq!(toks[1], TokenKind::ColonColon);
        assert!(matches!(&toks[2], TokenKind::Name { text, .. } if text == "member"));
    }

    #[test]
    fn template_tail_is_taken_when_it_names_a_type() {
        let mut p = StaticProvider::new(0x1000, 16);
        p.define_type("vector<int>", Type::long());
        let toks = lex_all("vector<int>", &p);
        assert!(matches!(&toks[0], TokenKind::TypeName { text, .. } if text == "vector<int>"));
        // without the type, it lexes as name < name >
        let p2 = StaticProvider::new(0x1000, 16);
        let toks = lex_all("vector<int>", &p2);
        assert!(matches!(&toks[0], TokenKind::Name { .. }));
        assert_eq!(toks[1], TokenKind::Less);
    }

    #[test]
    fn macro_expansion_splices_once() {
        let mut p = StaticProvider::new(0x1000, 16);
        p.define_macro("TWO", "2");
        let toks = lex_all("1 + TWO", &p);
        assert!(matches!(toks[2], TokenKind::Int { value: 2, .. }));
        assert_eq!(toks[3], TokenKind::End);
    }

    #[test]
    fn completion_after_structop() {
        let p = StaticProvider::new(0x1000, 16);
        let mut lx = Lexer::new("p.", DialectKind::C.dialect(), &p, None);
        lx.enable_completion();
        let _name = lx.next_token().unwrap();
        let _dot = lx.next_token().unwrap();
        let t = lx.next_token().unwrap();
        assert!(matches!(t.kind, TokenKind::Complete { text } if text.is_empty()));
    }

    #[test]
    fn completion_at_trailing_name() {
        let p = StaticProvider::new(0x1000, 16);
        let mut lx = Lexer::new("foo", DialectKind::C.dialect(), &p, None);
        lx.enable_completion();
        let t = lx.next_token().unwrap();
        assert!(matches!(t.kind, TokenKind::Complete { text } if text == "foo"));
    }

    #[test]
    fn go_numbers_default_to_wide_int() {
        let p = StaticProvider::new(0x1000, 16);
        let mut lx = Lexer::new("1", DialectKind::Go.dialect(), &p, None);
        match lx.next_token().unwrap().kind {
            TokenKind::Int { ty, .. } => assert_eq!(ty.size_of(), 8),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn go_raw_strings() {
        let p = StaticProvider::new(0x1000, 16);
        let mut lx = Lexer::new("`a\\n`", DialectKind::Go.dialect(), &p, None);
        match lx.next_token().unwrap().kind {
            TokenKind::String { bytes, .. } => assert_eq!(bytes, b"a\\n".to_vec()),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn go_package_names_collapse() {
        let mut p = StaticProvider::new(0x1000, 16);
        p.define_symbol(crate::provider::Symbol {
            name: "fmt".into(),
            kind: SymbolKind::Scope,
        });
        p.define_variable("fmt.count", Type::int(), 0x1000);
        let mut lx = Lexer::new("fmt.count", DialectKind::Go.dialect(), &p, None);
        let t = lx.next_token().unwrap();
        assert!(matches!(t.kind, TokenKind::Name { text, symbol: Some(_), .. } if text == "fmt.count"));
    }
}
