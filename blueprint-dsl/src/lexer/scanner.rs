//! Lexer implementation
//!
//! Converts raw source text into a flat token stream, synthesizing
//! INDENT/DEDENT/NEWLINE tokens from leading whitespace. The lexer never
//! fails: malformed input becomes an `Error` token plus a diagnostic, and
//! scanning resynchronizes at the next line boundary.

use super::token::*;
use crate::errors::ErrorReporter;
use std::iter::Peekable;
use std::str::CharIndices;

/// A tab advances the indentation width to the next multiple of this.
const TAB_WIDTH: usize = 4;

/// Lexer for the Blueprint DSL.
pub struct Lexer<'a> {
    source: &'a str,
    chars: Peekable<CharIndices<'a>>,
    line: usize,
    column: usize,
    pos: usize,
    indent_stack: Vec<usize>,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer for the given source.
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
            line: 1,
            column: 1,
            pos: 0,
            indent_stack: vec![0],
            tokens: Vec::new(),
        }
    }

    /// Tokenize the entire source, reporting lexical problems to `reporter`.
    ///
    /// Always returns a complete token stream ending in `Eof`, with every
    /// open indentation level closed by a `Dedent`.
    pub fn tokenize(mut self, reporter: &mut ErrorReporter) -> Vec<Token> {
        while self.peek_char().is_some() {
            self.scan_line(reporter);
        }

        // A final statement without a trailing newline still terminates.
        if matches!(self.tokens.last(), Some(t) if t.kind != TokenKind::Newline) {
            let span = self.span_here();
            self.tokens.push(Token {
                kind: TokenKind::Newline,
                span,
            });
        }

        while self.indent_stack.len() > 1 {
            self.indent_stack.pop();
            let span = self.span_here();
            self.tokens.push(Token {
                kind: TokenKind::Dedent,
                span,
            });
        }

        let span = self.span_here();
        self.tokens.push(Token {
            kind: TokenKind::Eof,
            span,
        });
        self.tokens
    }

    /// Scan one physical line: leading whitespace, then its tokens.
    fn scan_line(&mut self, reporter: &mut ErrorReporter) {
        let line_no = self.line;
        let mut width = 0usize;
        let mut saw_space = false;
        let mut saw_tab = false;

        while let Some(c) = self.peek_char() {
            match c {
                ' ' => {
                    saw_space = true;
                    width += 1;
                    self.advance();
                }
                '\t' => {
                    saw_tab = true;
                    width = (width / TAB_WIDTH + 1) * TAB_WIDTH;
                    self.advance();
                }
                _ => break,
            }
        }

        // Blank and comment-only lines carry no layout meaning.
        match self.peek_char() {
            None => return,
            Some('\n') => {
                self.advance();
                return;
            }
            Some('\r') => {
                self.advance();
                if self.peek_char() == Some('\n') {
                    self.advance();
                }
                return;
            }
            Some('#') => {
                self.skip_to_line_end();
                if self.peek_char() == Some('\n') {
                    self.advance();
                }
                return;
            }
            Some(_) => {}
        }

        if saw_space && saw_tab {
            reporter.error("mixed tabs and spaces in indentation", line_no, 1);
        }

        self.handle_indentation(width, line_no, reporter);
        self.scan_tokens_until_newline(reporter);
    }

    /// Compare a logical line's indentation width against the stack and
    /// emit INDENT/DEDENT tokens.
    fn handle_indentation(&mut self, width: usize, line: usize, reporter: &mut ErrorReporter) {
        let current = self.indent_stack.last().copied().unwrap_or(0);

        if width > current {
            self.indent_stack.push(width);
            self.push_structural(TokenKind::Indent, line);
        } else if width < current {
            while self.indent_stack.len() > 1
                && width < self.indent_stack.last().copied().unwrap_or(0)
            {
                self.indent_stack.pop();
                self.push_structural(TokenKind::Dedent, line);
            }
            if self.indent_stack.last().copied().unwrap_or(0) != width {
                reporter.error("inconsistent indentation", line, 1);
                // Resynchronize by treating this width as a fresh level.
                self.indent_stack.push(width);
                self.push_structural(TokenKind::Indent, line);
            }
        }
    }

    fn scan_tokens_until_newline(&mut self, reporter: &mut ErrorReporter) {
        loop {
            match self.peek_char() {
                None => break,
                Some('\n') => {
                    let span = self.span_here();
                    self.advance();
                    self.tokens.push(Token {
                        kind: TokenKind::Newline,
                        span,
                    });
                    break;
                }
                Some('\r') => {
                    self.advance();
                }
                Some(' ') | Some('\t') => {
                    self.advance();
                }
                Some('#') => {
                    self.skip_to_line_end();
                }
                Some(c) => {
                    let token = self.next_token(c, reporter);
                    let is_error = matches!(token.kind, TokenKind::Error(_));
                    self.tokens.push(token);
                    if is_error {
                        // Drop the remainder of the line and resume cleanly.
                        self.skip_to_line_end();
                    }
                }
            }
        }
    }

    /// Scan a single token starting at `c`.
    fn next_token(&mut self, c: char, reporter: &mut ErrorReporter) -> Token {
        let start_pos = self.pos;
        let start_line = self.line;
        let start_col = self.column;

        let kind = match c {
            ':' => {
                self.advance();
                TokenKind::Colon
            }
            '=' => {
                self.advance();
                TokenKind::Equals
            }
            ',' => {
                self.advance();
                TokenKind::Comma
            }
            '.' => {
                self.advance();
                TokenKind::Dot
            }
            '[' => {
                self.advance();
                TokenKind::LBracket
            }
            ']' => {
                self.advance();
                TokenKind::RBracket
            }
            '(' => {
                self.advance();
                TokenKind::LParen
            }
            ')' => {
                self.advance();
                TokenKind::RParen
            }
            '?' => {
                self.advance();
                TokenKind::Question
            }

            '-' => {
                self.advance();
                match self.peek_char() {
                    Some('>') => {
                        self.advance();
                        TokenKind::Arrow
                    }
                    Some('=') => {
                        self.advance();
                        TokenKind::MinusEquals
                    }
                    _ => {
                        reporter.error("unexpected character '-'", start_line, start_col);
                        TokenKind::Error("unexpected character '-'".to_string())
                    }
                }
            }

            '+' => {
                self.advance();
                if self.peek_char() == Some('=') {
                    self.advance();
                    TokenKind::PlusEquals
                } else {
                    reporter.error("unexpected character '+'", start_line, start_col);
                    TokenKind::Error("unexpected character '+'".to_string())
                }
            }

            '"' => self.scan_string(reporter),

            c if c.is_ascii_digit() => self.scan_number(),

            c if c.is_ascii_alphabetic() || c == '_' => self.scan_identifier(),

            c => {
                self.advance();
                let message = format!("unexpected character '{}'", c);
                reporter.error(message.clone(), start_line, start_col);
                TokenKind::Error(message)
            }
        };

        Token {
            kind,
            span: Span {
                start: start_pos,
                end: self.pos,
                line: start_line,
                column: start_col,
            },
        }
    }

    /// Scan an identifier or keyword.
    fn scan_identifier(&mut self) -> TokenKind {
        let start = self.pos;

        while let Some(c) = self.peek_char() {
            if c.is_ascii_alphanumeric() || c == '_' {
                self.advance();
            } else {
                break;
            }
        }

        let ident = &self.source[start..self.pos];
        TokenKind::keyword(ident).unwrap_or_else(|| TokenKind::Identifier(ident.to_string()))
    }

    /// Scan a string literal with escape sequences.
    ///
    /// An unterminated literal ends at the line boundary; the scanned prefix
    /// is kept so parsing can continue.
    fn scan_string(&mut self, reporter: &mut ErrorReporter) -> TokenKind {
        let start_line = self.line;
        let start_col = self.column;
        self.advance(); // consume opening quote
        let mut value = String::new();

        loop {
            match self.peek_char() {
                None | Some('\n') => {
                    reporter.error("unterminated string literal", start_line, start_col);
                    return TokenKind::Str(value);
                }
                Some('"') => {
                    self.advance();
                    break;
                }
                Some('\\') => {
                    self.advance();
                    match self.peek_char() {
                        Some('n') => {
                            self.advance();
                            value.push('\n');
                        }
                        Some('t') => {
                            self.advance();
                            value.push('\t');
                        }
                        Some('r') => {
                            self.advance();
                            value.push('\r');
                        }
                        Some('\\') => {
                            self.advance();
                            value.push('\\');
                        }
                        Some('"') => {
                            self.advance();
                            value.push('"');
                        }
                        _ => value.push('\\'),
                    }
                }
                Some(c) => {
                    self.advance();
                    value.push(c);
                }
            }
        }

        TokenKind::Str(value)
    }

    /// Scan a decimal integer or float literal by maximal munch.
    fn scan_number(&mut self) -> TokenKind {
        let start = self.pos;

        while let Some(c) = self.peek_char() {
            if c.is_ascii_digit() {
                self.advance();
            } else {
                break;
            }
        }

        if self.peek_char() == Some('.')
            && self
                .peek_next_char()
                .map(|c| c.is_ascii_digit())
                .unwrap_or(false)
        {
            self.advance(); // '.'
            while let Some(c) = self.peek_char() {
                if c.is_ascii_digit() {
                    self.advance();
                } else {
                    break;
                }
            }
        }

        let text = &self.source[start..self.pos];
        match text.parse::<f64>() {
            Ok(n) => TokenKind::Number(n),
            Err(_) => TokenKind::Error(format!("invalid number: {}", text)),
        }
    }

    fn skip_to_line_end(&mut self) {
        while let Some(c) = self.peek_char() {
            if c == '\n' {
                break;
            }
            self.advance();
        }
    }

    fn push_structural(&mut self, kind: TokenKind, line: usize) {
        self.tokens.push(Token {
            kind,
            span: Span {
                start: self.pos,
                end: self.pos,
                line,
                column: 1,
            },
        });
    }

    fn span_here(&mut self) -> Span {
        Span {
            start: self.pos,
            end: self.pos,
            line: self.line,
            column: self.column,
        }
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    fn peek_next_char(&self) -> Option<char> {
        let mut iter = self.source[self.pos..].char_indices();
        iter.next();
        iter.next().map(|(_, c)| c)
    }

    fn advance(&mut self) -> Option<char> {
        if let Some((i, c)) = self.chars.next() {
            self.pos = i + c.len_utf8();
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
            Some(c)
        } else {
            None
        }
    }
}
