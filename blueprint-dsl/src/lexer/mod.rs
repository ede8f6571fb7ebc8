//! Lexer module

pub mod scanner;
pub mod token;

pub use scanner::Lexer;
pub use token::{Span, Token, TokenKind};

use crate::errors::Diagnostic;

/// Tokenize source text, returning the token stream and any lexical
/// diagnostics. Never fails; see [`Lexer::tokenize`].
pub fn tokenize(source: &str) -> (Vec<Token>, Vec<Diagnostic>) {
    let mut reporter = crate::errors::ErrorReporter::new();
    let tokens = Lexer::new(source).tokenize(&mut reporter);
    (tokens, reporter.into_diagnostics())
}
