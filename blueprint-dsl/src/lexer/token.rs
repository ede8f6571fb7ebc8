//! Lexer token types

use std::fmt;

/// Token kinds for the Blueprint DSL.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Declaration keywords
    System,
    Template,
    Interface,
    Module,
    Pipeline,
    Policy,

    // Body keywords
    Method,
    Endpoint,
    Websocket,
    Command,
    Model,
    Field,
    Contract,
    Implements,
    Exports,
    Requires,
    Owns,
    Api,
    Invariants,
    Invariant,
    Acceptance,
    Test,
    Artifacts,
    Stack,
    Intent,
    Primary,
    Outcomes,
    OutOfScope,
    Config,
    Step,
    Output,
    Require,
    Gate,
    Modules,

    // Inheritance keywords
    Extends,
    Override,
    Append,
    Remove,
    Replace,
    Block,

    // Operators and delimiters
    Colon,
    Equals,
    Comma,
    Dot,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Arrow,
    PlusEquals,
    MinusEquals,
    Question,

    // Literals
    Str(String),
    Number(f64),
    Identifier(String),

    // Structural tokens synthesized from layout
    Newline,
    Indent,
    Dedent,

    // Special
    Eof,
    Error(String),
}

impl TokenKind {
    /// The source text of a bare keyword, if this kind is one.
    ///
    /// Keywords double as plain names in key positions (stack entries,
    /// config keys, dotted edit paths), so the parser needs their text back.
    pub fn keyword_text(&self) -> Option<&'static str> {
        let text = match self {
            TokenKind::System => "system",
            TokenKind::Template => "template",
            TokenKind::Interface => "interface",
            TokenKind::Module => "module",
            TokenKind::Pipeline => "pipeline",
            TokenKind::Policy => "policy",
            TokenKind::Method => "method",
            TokenKind::Endpoint => "endpoint",
            TokenKind::Websocket => "websocket",
            TokenKind::Command => "command",
            TokenKind::Model => "model",
            TokenKind::Field => "field",
            TokenKind::Contract => "contract",
            TokenKind::Implements => "implements",
            TokenKind::Exports => "exports",
            TokenKind::Requires => "requires",
            TokenKind::Owns => "owns",
            TokenKind::Api => "api",
            TokenKind::Invariants => "invariants",
            TokenKind::Invariant => "invariant",
            TokenKind::Acceptance => "acceptance",
            TokenKind::Test => "test",
            TokenKind::Artifacts => "artifacts",
            TokenKind::Stack => "stack",
            TokenKind::Intent => "intent",
            TokenKind::Primary => "primary",
            TokenKind::Outcomes => "outcomes",
            TokenKind::OutOfScope => "out_of_scope",
            TokenKind::Config => "config",
            TokenKind::Step => "step",
            TokenKind::Output => "output",
            TokenKind::Require => "require",
            TokenKind::Gate => "gate",
            TokenKind::Modules => "modules",
            TokenKind::Extends => "extends",
            TokenKind::Override => "override",
            TokenKind::Append => "append",
            TokenKind::Remove => "remove",
            TokenKind::Replace => "replace",
            TokenKind::Block => "block",
            _ => return None,
        };
        Some(text)
    }

    /// Look up the keyword kind for an identifier, if it is one.
    pub fn keyword(ident: &str) -> Option<TokenKind> {
        let kind = match ident {
            "system" => TokenKind::System,
            "template" => TokenKind::Template,
            "interface" => TokenKind::Interface,
            "module" => TokenKind::Module,
            "pipeline" => TokenKind::Pipeline,
            "policy" => TokenKind::Policy,
            "method" => TokenKind::Method,
            "endpoint" => TokenKind::Endpoint,
            "websocket" => TokenKind::Websocket,
            "command" => TokenKind::Command,
            "model" => TokenKind::Model,
            "field" => TokenKind::Field,
            "contract" => TokenKind::Contract,
            "implements" => TokenKind::Implements,
            "exports" => TokenKind::Exports,
            "requires" => TokenKind::Requires,
            "owns" => TokenKind::Owns,
            "api" => TokenKind::Api,
            "invariants" => TokenKind::Invariants,
            "invariant" => TokenKind::Invariant,
            "acceptance" => TokenKind::Acceptance,
            "test" => TokenKind::Test,
            "artifacts" => TokenKind::Artifacts,
            "stack" => TokenKind::Stack,
            "intent" => TokenKind::Intent,
            "primary" => TokenKind::Primary,
            "outcomes" => TokenKind::Outcomes,
            "out_of_scope" => TokenKind::OutOfScope,
            "config" => TokenKind::Config,
            "step" => TokenKind::Step,
            "output" => TokenKind::Output,
            "require" => TokenKind::Require,
            "gate" => TokenKind::Gate,
            "modules" => TokenKind::Modules,
            "extends" => TokenKind::Extends,
            "override" => TokenKind::Override,
            "append" => TokenKind::Append,
            "remove" => TokenKind::Remove,
            "replace" => TokenKind::Replace,
            "block" => TokenKind::Block,
            _ => return None,
        };
        Some(kind)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Str(s) => write!(f, "string \"{}\"", s),
            TokenKind::Number(n) => write!(f, "number {}", n),
            TokenKind::Identifier(s) => write!(f, "identifier '{}'", s),
            TokenKind::Newline => write!(f, "newline"),
            TokenKind::Indent => write!(f, "indent"),
            TokenKind::Dedent => write!(f, "dedent"),
            TokenKind::Eof => write!(f, "end of input"),
            TokenKind::Error(msg) => write!(f, "invalid token ({})", msg),
            TokenKind::Colon => write!(f, "':'"),
            TokenKind::Equals => write!(f, "'='"),
            TokenKind::Comma => write!(f, "','"),
            TokenKind::Dot => write!(f, "'.'"),
            TokenKind::LBracket => write!(f, "'['"),
            TokenKind::RBracket => write!(f, "']'"),
            TokenKind::LParen => write!(f, "'('"),
            TokenKind::RParen => write!(f, "')'"),
            TokenKind::Arrow => write!(f, "'->'"),
            TokenKind::PlusEquals => write!(f, "'+='"),
            TokenKind::MinusEquals => write!(f, "'-='"),
            TokenKind::Question => write!(f, "'?'"),
            other => match other.keyword_text() {
                Some(text) => write!(f, "'{}'", text),
                None => write!(f, "{:?}", other),
            },
        }
    }
}

/// Source location span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
}

impl Default for Span {
    fn default() -> Self {
        Self {
            start: 0,
            end: 0,
            line: 1,
            column: 1,
        }
    }
}

/// A token with its kind and source location.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}
