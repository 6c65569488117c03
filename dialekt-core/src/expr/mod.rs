//! Expression parsing, printing and evaluation.
//!
//! Source text goes through the [`lexer`] (token stream with a
//! re-lexing FIFO for qualified names), the [`parser`] (operation tree
//! via an explicit parser context), and then either [`print`] or
//! [`eval`], the latter consulting the external symbol/value provider
//! at every leaf.

pub mod ast;
pub mod error;
pub mod eval;
pub mod lexer;
pub mod parser;
pub mod print;
pub mod token;
pub mod typestack;

pub use ast::Operation;
pub use error::{EvalError, ParseError};
pub use eval::{EvalMode, Evaluator};
pub use parser::{
    parse_expression, parse_for_completion, CompletionKind, CompletionPoint, ParsedExpression,
};

use crate::provider::Provider;
use crate::value::Value;

impl ParsedExpression {
    /// Infix re-rendering of the tree (round-trips grouping).
    pub fn print(&self) -> String {
        print::print(&self.root, self.dialect)
    }

    /// Flat pre-order diagnostic listing.
    pub fn dump(&self) -> String {
        print::dump(&self.root)
    }

    /// Evaluate against live state.
    pub fn evaluate(&self, provider: &dyn Provider) -> Result<Value, EvalError> {
        Evaluator::new(provider, self.dialect).evaluate(&self.root)
    }

    /// Evaluate without firing side effects (types the result).
    pub fn evaluate_type(&self, provider: &dyn Provider) -> Result<Value, EvalError> {
        Evaluator::new(provider, self.dialect)
            .with_mode(EvalMode::SideEffectFree)
            .evaluate(&self.root)
    }
}
