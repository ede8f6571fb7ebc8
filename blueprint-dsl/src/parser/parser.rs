//! Parser implementation
//!
//! Recursive descent over the token stream, one function per grammar
//! production. Every block-introducing construct follows the shape
//! `keyword [name] [extends name]? ':' NEWLINE INDENT (statement NEWLINE)+
//! DEDENT`. Parsing never aborts the document: an unexpected token is
//! recorded as a diagnostic and the parser resynchronizes to the next
//! sibling statement at the same indentation depth.

use super::ast::*;
use crate::errors::{Diagnostic, ErrorReporter};
use crate::lexer::{Lexer, Token, TokenKind};

/// Parser for the Blueprint DSL.
///
/// Holds a live reference to the compilation's error reporter; recovered
/// syntax errors are appended there, not returned.
pub struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    reporter: &'a mut ErrorReporter,
}

impl<'a> Parser<'a> {
    /// Create a new parser over a token stream.
    pub fn new(tokens: Vec<Token>, reporter: &'a mut ErrorReporter) -> Self {
        Self {
            tokens,
            pos: 0,
            reporter,
        }
    }

    /// Parse the token stream into a document.
    ///
    /// All well-formed statements are returned even when earlier siblings
    /// failed; failures become diagnostics on the reporter.
    pub fn parse_document(&mut self) -> Document {
        let mut statements = Vec::new();

        loop {
            self.skip_statement_separators();
            if self.is_at_end() {
                break;
            }
            // A stray INDENT here means indentation recovery upstream; step
            // past it so the indented statements are still examined.
            if self.check(&TokenKind::Indent) {
                let err = self.error("unexpected indentation");
                self.report(err);
                self.advance();
                continue;
            }
            match self.parse_statement() {
                Ok(stmt) => statements.push(stmt),
                Err(err) => {
                    self.report(err);
                    self.synchronize();
                }
            }
        }

        Document { statements }
    }

    /// Parse a single declaration statement.
    fn parse_statement(&mut self) -> Result<Statement, ParseError> {
        match &self.current().kind {
            TokenKind::Template => self
                .parse_system_decl(TokenKind::Template)
                .map(Statement::Template),
            TokenKind::System => self
                .parse_system_decl(TokenKind::System)
                .map(Statement::System),
            TokenKind::Interface => self.parse_interface().map(Statement::Interface),
            TokenKind::Module => self.parse_module().map(Statement::Module),
            TokenKind::Policy => self.parse_policy().map(Statement::Policy),
            TokenKind::Pipeline => self.parse_pipeline().map(Statement::Pipeline),
            other => Err(self.error(&format!(
                "expected declaration (system, template, interface, module, policy, pipeline), found {}",
                other
            ))),
        }
    }

    // ========================================================================
    // System / template
    // ========================================================================

    /// Parse `system "Name" [extends "Parent"]:` or the `template` form.
    fn parse_system_decl(&mut self, keyword: TokenKind) -> Result<SystemDecl, ParseError> {
        let span = self.current().span;
        self.expect(keyword)?;

        let name = self.expect_string()?;
        let extends = if self.check(&TokenKind::Extends) {
            self.advance();
            Some(self.expect_string()?)
        } else {
            None
        };

        let mut decl = SystemDecl {
            name,
            extends,
            version: None,
            stack: Vec::new(),
            intent: None,
            interfaces: Vec::new(),
            modules: Vec::new(),
            policies: Vec::new(),
            pipelines: Vec::new(),
            edits: Vec::new(),
            span,
        };

        if self.begin_block()? {
            while !self.block_done() {
                if let Err(err) = self.parse_system_item(&mut decl) {
                    self.report(err);
                    self.synchronize();
                }
            }
            self.end_block();
        }

        Ok(decl)
    }

    fn parse_system_item(&mut self, decl: &mut SystemDecl) -> Result<(), ParseError> {
        match &self.current().kind {
            TokenKind::Identifier(s) if s == "version" => {
                self.advance();
                self.expect(TokenKind::Equals)?;
                decl.version = Some(self.expect_string()?);
            }
            TokenKind::Stack => {
                self.advance();
                self.parse_stack_block(&mut decl.stack)?;
            }
            TokenKind::Intent => {
                self.advance();
                decl.intent = Some(self.parse_intent_block()?);
            }
            TokenKind::Interface => {
                let nested = self.parse_interface()?;
                decl.interfaces.push(nested);
            }
            TokenKind::Module => {
                let nested = self.parse_module()?;
                decl.modules.push(nested);
            }
            TokenKind::Policy => {
                let nested = self.parse_policy()?;
                decl.policies.push(nested);
            }
            TokenKind::Pipeline => {
                let nested = self.parse_pipeline()?;
                decl.pipelines.push(nested);
            }
            TokenKind::Override => {
                let span = self.current().span;
                self.advance();
                let path = self.parse_dotted_path()?;
                self.expect(TokenKind::Equals)?;
                let value = self.expect_string()?;
                decl.edits.push(EditOp::Override { path, value, span });
            }
            TokenKind::Append => {
                let span = self.current().span;
                self.advance();
                let path = self.parse_dotted_path()?;
                self.expect(TokenKind::PlusEquals)?;
                let value = self.expect_string()?;
                decl.edits.push(EditOp::Append { path, value, span });
            }
            TokenKind::Remove => {
                let span = self.current().span;
                self.advance();
                let path = self.parse_dotted_path()?;
                self.expect(TokenKind::MinusEquals)?;
                let value = self.expect_string()?;
                decl.edits.push(EditOp::Remove { path, value, span });
            }
            TokenKind::Replace => {
                let span = self.current().span;
                self.advance();
                self.expect(TokenKind::Block)?;
                let name = self.expect_name()?;
                self.expect(TokenKind::Colon)?;
                self.expect(TokenKind::Newline)?;
                self.expect(TokenKind::Indent)?;
                self.skip_newlines();
                let block = self.parse_statement()?;
                self.skip_newlines();
                self.end_block();
                decl.edits.push(EditOp::Replace {
                    name,
                    block: Box::new(block),
                    span,
                });
            }
            other => {
                return Err(self.error(&format!("unexpected {} in system body", other)));
            }
        }
        Ok(())
    }

    fn parse_stack_block(&mut self, entries: &mut Vec<StackEntry>) -> Result<(), ParseError> {
        if self.begin_block()? {
            while !self.block_done() {
                if let Err(err) = self.parse_stack_entry(entries) {
                    self.report(err);
                    self.synchronize();
                }
            }
            self.end_block();
        }
        Ok(())
    }

    fn parse_stack_entry(&mut self, entries: &mut Vec<StackEntry>) -> Result<(), ParseError> {
        let span = self.current().span;
        let key = self.expect_key()?;
        self.expect(TokenKind::Equals)?;
        let value = self.expect_string()?;
        entries.push(StackEntry { key, value, span });
        Ok(())
    }

    fn parse_intent_block(&mut self) -> Result<IntentDecl, ParseError> {
        let span = self.current().span;
        let mut intent = IntentDecl {
            span,
            ..Default::default()
        };

        if self.begin_block()? {
            while !self.block_done() {
                if let Err(err) = self.parse_intent_item(&mut intent) {
                    self.report(err);
                    self.synchronize();
                }
            }
            self.end_block();
        }

        Ok(intent)
    }

    fn parse_intent_item(&mut self, intent: &mut IntentDecl) -> Result<(), ParseError> {
        match &self.current().kind {
            TokenKind::Primary => {
                self.advance();
                self.expect(TokenKind::Equals)?;
                intent.primary = Some(self.expect_string()?);
            }
            TokenKind::Outcomes => {
                self.advance();
                self.expect(TokenKind::Equals)?;
                intent.outcomes = Some(self.parse_string_list()?);
            }
            TokenKind::OutOfScope => {
                self.advance();
                self.expect(TokenKind::Equals)?;
                intent.out_of_scope = Some(self.parse_string_list()?);
            }
            other => {
                return Err(self.error(&format!("unexpected {} in intent block", other)));
            }
        }
        Ok(())
    }

    // ========================================================================
    // Interface
    // ========================================================================

    fn parse_interface(&mut self) -> Result<InterfaceDecl, ParseError> {
        let span = self.current().span;
        self.expect(TokenKind::Interface)?;

        let name = self.expect_identifier()?;
        let extends = if self.check(&TokenKind::Extends) {
            self.advance();
            Some(self.expect_identifier()?)
        } else {
            None
        };

        let mut decl = InterfaceDecl {
            name,
            doc: None,
            extends,
            methods: Vec::new(),
            invariants: Vec::new(),
            span,
        };

        if self.begin_block()? {
            while !self.block_done() {
                if let Err(err) = self.parse_interface_item(&mut decl) {
                    self.report(err);
                    self.synchronize();
                }
            }
            self.end_block();
        }

        Ok(decl)
    }

    fn parse_interface_item(&mut self, decl: &mut InterfaceDecl) -> Result<(), ParseError> {
        match &self.current().kind {
            TokenKind::Identifier(s) if s == "doc" => {
                self.advance();
                self.expect(TokenKind::Equals)?;
                decl.doc = Some(self.expect_string()?);
            }
            TokenKind::Method => {
                let sig = self.parse_method(false)?;
                decl.methods.push(sig);
            }
            TokenKind::Override => {
                self.advance();
                if !self.check(&TokenKind::Method) {
                    return Err(self.error("expected 'method' after 'override'"));
                }
                let sig = self.parse_method(true)?;
                decl.methods.push(sig);
            }
            TokenKind::Invariants => {
                self.advance();
                decl.invariants = self.parse_invariant_lines()?;
            }
            other => {
                return Err(self.error(&format!("unexpected {} in interface body", other)));
            }
        }
        Ok(())
    }

    /// Parse `method name(p: Type, ...) -> Type`; the `method` keyword is
    /// still current. Method and parameter names may shadow keywords.
    fn parse_method(&mut self, is_override: bool) -> Result<MethodSig, ParseError> {
        let span = self.current().span;
        self.expect(TokenKind::Method)?;
        let name = self.expect_key()?;

        self.expect(TokenKind::LParen)?;
        let mut params = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                let pname = self.expect_key()?;
                self.expect(TokenKind::Colon)?;
                let ty = self.parse_type()?;
                params.push(Param { name: pname, ty });
                if self.check(&TokenKind::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen)?;

        self.expect(TokenKind::Arrow)?;
        let return_type = self.parse_type()?;

        Ok(MethodSig {
            name,
            params,
            return_type,
            is_override,
            span,
        })
    }

    /// Parse a type annotation: `Name`, `Name[Arg, ...]`, with any number
    /// of trailing `?` optional markers.
    fn parse_type(&mut self) -> Result<TypeRef, ParseError> {
        let base = match &self.current().kind {
            TokenKind::Identifier(s) => {
                let s = s.clone();
                self.advance();
                s
            }
            other => {
                return Err(self.error(&format!("expected type annotation, found {}", other)));
            }
        };

        let mut ty = if self.check(&TokenKind::LBracket) {
            self.advance();
            let mut args = vec![self.parse_type()?];
            while self.check(&TokenKind::Comma) {
                self.advance();
                args.push(self.parse_type()?);
            }
            self.expect(TokenKind::RBracket)?;
            TypeRef::Generic { base, args }
        } else {
            TypeRef::Named(base)
        };

        while self.check(&TokenKind::Question) {
            self.advance();
            ty = TypeRef::Optional(Box::new(ty));
        }

        Ok(ty)
    }

    // ========================================================================
    // Module
    // ========================================================================

    fn parse_module(&mut self) -> Result<ModuleDecl, ParseError> {
        let span = self.current().span;
        self.expect(TokenKind::Module)?;
        let name = self.expect_identifier()?;

        let mut decl = ModuleDecl {
            name,
            doc: None,
            owns: Vec::new(),
            requires: Vec::new(),
            implements: Vec::new(),
            exports: Vec::new(),
            api: None,
            contract: Vec::new(),
            invariants: Vec::new(),
            acceptance: Vec::new(),
            artifacts: Vec::new(),
            config: Vec::new(),
            span,
        };

        if self.begin_block()? {
            while !self.block_done() {
                if let Err(err) = self.parse_module_item(&mut decl) {
                    self.report(err);
                    self.synchronize();
                }
            }
            self.end_block();
        }

        Ok(decl)
    }

    fn parse_module_item(&mut self, decl: &mut ModuleDecl) -> Result<(), ParseError> {
        match &self.current().kind {
            TokenKind::Identifier(s) if s == "doc" => {
                self.advance();
                self.expect(TokenKind::Equals)?;
                decl.doc = Some(self.expect_string()?);
            }
            TokenKind::Owns => {
                self.advance();
                self.expect(TokenKind::Equals)?;
                decl.owns = self.parse_string_list()?;
            }
            TokenKind::Requires => {
                self.advance();
                self.expect(TokenKind::Equals)?;
                decl.requires = self.parse_name_list()?;
            }
            TokenKind::Implements => {
                self.advance();
                self.expect(TokenKind::Equals)?;
                decl.implements = self.parse_name_list()?;
            }
            TokenKind::Exports => {
                self.advance();
                self.expect(TokenKind::Equals)?;
                decl.exports = self.parse_name_list()?;
            }
            TokenKind::Api => {
                self.advance();
                decl.api = Some(self.parse_api_block()?);
            }
            TokenKind::Contract => {
                self.advance();
                decl.contract = self.parse_contract_block()?;
            }
            TokenKind::Invariants => {
                self.advance();
                decl.invariants = self.parse_invariant_lines()?;
            }
            TokenKind::Acceptance => {
                self.advance();
                decl.acceptance = self.parse_acceptance_lines()?;
            }
            TokenKind::Artifacts => {
                self.advance();
                self.expect(TokenKind::Equals)?;
                decl.artifacts = self.parse_string_list()?;
            }
            TokenKind::Config => {
                self.advance();
                self.parse_config_block(&mut decl.config)?;
            }
            other => {
                return Err(self.error(&format!("unexpected {} in module body", other)));
            }
        }
        Ok(())
    }

    fn parse_api_block(&mut self) -> Result<ApiDecl, ParseError> {
        let span = self.current().span;
        let mut api = ApiDecl {
            entries: Vec::new(),
            span,
        };

        if self.begin_block()? {
            while !self.block_done() {
                if let Err(err) = self.parse_api_item(&mut api) {
                    self.report(err);
                    self.synchronize();
                }
            }
            self.end_block();
        }

        Ok(api)
    }

    fn parse_api_item(&mut self, api: &mut ApiDecl) -> Result<(), ParseError> {
        match &self.current().kind {
            TokenKind::Endpoint => {
                let span = self.current().span;
                self.advance();
                let raw = self.expect_string()?;
                let (method, path) = split_endpoint(&raw).ok_or_else(|| ParseError {
                    message: format!("invalid endpoint format: \"{}\"", raw),
                    line: span.line,
                    column: span.column,
                })?;
                self.expect(TokenKind::Arrow)?;
                let returns = self.parse_type()?;
                let status = if let TokenKind::Number(n) = self.current().kind {
                    self.advance();
                    Some(n as u16)
                } else {
                    None
                };
                api.entries.push(ApiEntry::Endpoint(EndpointDecl {
                    method,
                    path,
                    returns,
                    status,
                    span,
                }));
            }
            TokenKind::Websocket => {
                let span = self.current().span;
                self.advance();
                let path = self.expect_string()?;
                self.expect(TokenKind::Arrow)?;
                let returns = self.parse_type()?;
                api.entries.push(ApiEntry::Websocket(WebsocketDecl {
                    path,
                    returns,
                    span,
                }));
            }
            TokenKind::Command => {
                let span = self.current().span;
                self.advance();
                let name = self.expect_string()?;
                self.expect(TokenKind::Arrow)?;
                let returns = self.parse_type()?;
                api.entries.push(ApiEntry::Command(CommandDecl {
                    name,
                    returns,
                    span,
                }));
            }
            TokenKind::Model => {
                let model = self.parse_model()?;
                api.entries.push(ApiEntry::Model(model));
            }
            other => {
                return Err(self.error(&format!("unexpected {} in api block", other)));
            }
        }
        Ok(())
    }

    fn parse_model(&mut self) -> Result<ModelDecl, ParseError> {
        let span = self.current().span;
        self.expect(TokenKind::Model)?;
        let name = self.expect_identifier()?;

        let mut fields = Vec::new();
        if self.begin_block()? {
            while !self.block_done() {
                let result = (|| -> Result<(), ParseError> {
                    let field_span = self.current().span;
                    self.expect(TokenKind::Field)?;
                    let fname = self.expect_key()?;
                    self.expect(TokenKind::Colon)?;
                    let ty = self.parse_type()?;
                    fields.push(FieldDecl {
                        name: fname,
                        ty,
                        span: field_span,
                    });
                    Ok(())
                })();
                if let Err(err) = result {
                    self.report(err);
                    self.synchronize();
                }
            }
            self.end_block();
        }

        Ok(ModelDecl { name, fields, span })
    }

    /// Parse a `contract:` block of method signatures.
    fn parse_contract_block(&mut self) -> Result<Vec<MethodSig>, ParseError> {
        let mut methods = Vec::new();
        if self.begin_block()? {
            while !self.block_done() {
                let result = if self.check(&TokenKind::Method) {
                    self.parse_method(false).map(|sig| methods.push(sig))
                } else {
                    Err(self.error(&format!(
                        "unexpected {} in contract block",
                        self.current().kind
                    )))
                };
                if let Err(err) = result {
                    self.report(err);
                    self.synchronize();
                }
            }
            self.end_block();
        }
        Ok(methods)
    }

    fn parse_config_block(&mut self, entries: &mut Vec<ConfigEntry>) -> Result<(), ParseError> {
        if self.begin_block()? {
            while !self.block_done() {
                let result = (|| -> Result<(), ParseError> {
                    let span = self.current().span;
                    let key = self.expect_key()?;
                    self.expect(TokenKind::Equals)?;
                    let value = self.parse_config_value()?;
                    entries.push(ConfigEntry { key, value, span });
                    Ok(())
                })();
                if let Err(err) = result {
                    self.report(err);
                    self.synchronize();
                }
            }
            self.end_block();
        }
        Ok(())
    }

    fn parse_config_value(&mut self) -> Result<ConfigValue, ParseError> {
        match &self.current().kind {
            TokenKind::Str(s) => {
                let value = ConfigValue::Str(s.clone());
                self.advance();
                Ok(value)
            }
            TokenKind::Number(n) => {
                let value = ConfigValue::Number(*n);
                self.advance();
                Ok(value)
            }
            TokenKind::Identifier(s) if s == "true" => {
                self.advance();
                Ok(ConfigValue::Bool(true))
            }
            TokenKind::Identifier(s) if s == "false" => {
                self.advance();
                Ok(ConfigValue::Bool(false))
            }
            other => Err(self.error(&format!(
                "expected config value (string, number, or boolean), found {}",
                other
            ))),
        }
    }

    // ========================================================================
    // Policy
    // ========================================================================

    fn parse_policy(&mut self) -> Result<PolicyDecl, ParseError> {
        let span = self.current().span;
        self.expect(TokenKind::Policy)?;
        let name = self.expect_identifier()?;

        let mut rules = Vec::new();
        if self.begin_block()? {
            while !self.block_done() {
                let result = self.parse_rule().map(|rule| rules.push(rule));
                if let Err(err) = result {
                    self.report(err);
                    self.synchronize();
                }
            }
            self.end_block();
        }

        Ok(PolicyDecl { name, rules, span })
    }

    /// Parse `rule "text" severity=level` or `rule "text" [level]`.
    fn parse_rule(&mut self) -> Result<RuleDecl, ParseError> {
        let span = self.current().span;
        match &self.current().kind {
            TokenKind::Identifier(s) if s == "rule" => self.advance(),
            other => {
                return Err(self.error(&format!("unexpected {} in policy body", other)));
            }
        }

        let text = self.expect_string()?;

        let severity = match &self.current().kind {
            TokenKind::Identifier(s) if s == "severity" => {
                self.advance();
                self.expect(TokenKind::Equals)?;
                self.expect_identifier()?
            }
            TokenKind::LBracket => {
                self.advance();
                let severity = self.expect_identifier()?;
                self.expect(TokenKind::RBracket)?;
                severity
            }
            other => {
                return Err(self.error(&format!(
                    "expected 'severity=' or '[level]' after rule text, found {}",
                    other
                )));
            }
        };

        Ok(RuleDecl {
            text,
            severity,
            span,
        })
    }

    // ========================================================================
    // Pipeline
    // ========================================================================

    fn parse_pipeline(&mut self) -> Result<PipelineDecl, ParseError> {
        let span = self.current().span;
        self.expect(TokenKind::Pipeline)?;
        let name = self.expect_string()?;

        let mut steps = Vec::new();
        if self.begin_block()? {
            while !self.block_done() {
                let result = if self.check(&TokenKind::Step) {
                    self.parse_step().map(|step| steps.push(step))
                } else {
                    Err(self.error(&format!(
                        "unexpected {} in pipeline body",
                        self.current().kind
                    )))
                };
                if let Err(err) = result {
                    self.report(err);
                    self.synchronize();
                }
            }
            self.end_block();
        }

        Ok(PipelineDecl { name, steps, span })
    }

    fn parse_step(&mut self) -> Result<StepDecl, ParseError> {
        let span = self.current().span;
        self.expect(TokenKind::Step)?;
        let name = self.expect_identifier()?;

        let mut step = StepDecl {
            name,
            modules: Vec::new(),
            output: None,
            require: None,
            gate: None,
            span,
        };

        if self.begin_block()? {
            while !self.block_done() {
                if let Err(err) = self.parse_step_item(&mut step) {
                    self.report(err);
                    self.synchronize();
                }
            }
            self.end_block();
        }

        Ok(step)
    }

    fn parse_step_item(&mut self, step: &mut StepDecl) -> Result<(), ParseError> {
        match &self.current().kind {
            TokenKind::Modules => {
                self.advance();
                self.expect(TokenKind::Equals)?;
                step.modules = self.parse_name_list()?;
            }
            TokenKind::Output => {
                self.advance();
                self.expect(TokenKind::Equals)?;
                let span = self.current().span;
                let name = self.expect_name()?;
                step.output = Some(NameRef { name, span });
            }
            TokenKind::Require => {
                self.advance();
                self.expect(TokenKind::Equals)?;
                step.require = Some(self.expect_string()?);
            }
            TokenKind::Gate => {
                self.advance();
                self.expect(TokenKind::Equals)?;
                step.gate = Some(self.expect_string()?);
            }
            other => {
                return Err(self.error(&format!("unexpected {} in step body", other)));
            }
        }
        Ok(())
    }

    // ========================================================================
    // Shared productions
    // ========================================================================

    /// Parse `invariants:` lines; the keyword is already consumed.
    fn parse_invariant_lines(&mut self) -> Result<Vec<String>, ParseError> {
        let mut items = Vec::new();
        if self.begin_block()? {
            while !self.block_done() {
                let result = if self.check(&TokenKind::Invariant) {
                    self.advance();
                    self.expect_string().map(|text| items.push(text))
                } else {
                    Err(self.error(&format!(
                        "expected 'invariant' in invariants block, found {}",
                        self.current().kind
                    )))
                };
                if let Err(err) = result {
                    self.report(err);
                    self.synchronize();
                }
            }
            self.end_block();
        }
        Ok(items)
    }

    /// Parse `acceptance:` test lines; the keyword is already consumed.
    fn parse_acceptance_lines(&mut self) -> Result<Vec<String>, ParseError> {
        let mut items = Vec::new();
        if self.begin_block()? {
            while !self.block_done() {
                let result = if self.check(&TokenKind::Test) {
                    self.advance();
                    self.expect_string().map(|text| items.push(text))
                } else {
                    Err(self.error(&format!(
                        "expected 'test' in acceptance block, found {}",
                        self.current().kind
                    )))
                };
                if let Err(err) = result {
                    self.report(err);
                    self.synchronize();
                }
            }
            self.end_block();
        }
        Ok(items)
    }

    /// Parse a bracketed list of string literals, possibly spanning lines.
    fn parse_string_list(&mut self) -> Result<Vec<String>, ParseError> {
        self.skip_layout();
        self.expect(TokenKind::LBracket)?;

        let mut items = Vec::new();
        loop {
            self.skip_layout();
            if self.check(&TokenKind::RBracket) {
                self.advance();
                break;
            }
            if self.is_at_end() {
                return Err(self.error("expected ']' to close list"));
            }
            items.push(self.expect_string()?);
            self.skip_layout();
            if self.check(&TokenKind::Comma) {
                self.advance();
            }
        }
        Ok(items)
    }

    /// Parse a bracketed list of names (identifiers or strings).
    fn parse_name_list(&mut self) -> Result<Vec<NameRef>, ParseError> {
        self.skip_layout();
        self.expect(TokenKind::LBracket)?;

        let mut items = Vec::new();
        loop {
            self.skip_layout();
            if self.check(&TokenKind::RBracket) {
                self.advance();
                break;
            }
            if self.is_at_end() {
                return Err(self.error("expected ']' to close list"));
            }
            let span = self.current().span;
            let name = self.expect_name()?;
            items.push(NameRef { name, span });
            self.skip_layout();
            if self.check(&TokenKind::Comma) {
                self.advance();
            }
        }
        Ok(items)
    }

    /// Parse a dotted path like `stack.language`; segments may be keywords.
    fn parse_dotted_path(&mut self) -> Result<Vec<String>, ParseError> {
        let mut path = vec![self.expect_key()?];
        while self.check(&TokenKind::Dot) {
            self.advance();
            path.push(self.expect_key()?);
        }
        Ok(path)
    }

    // ========================================================================
    // Block structure helpers
    // ========================================================================

    /// Consume `':' NEWLINE` and the block's INDENT, if any. Returns false
    /// for an empty block (header with no indented body).
    fn begin_block(&mut self) -> Result<bool, ParseError> {
        self.expect(TokenKind::Colon)?;
        self.expect(TokenKind::Newline)?;
        if self.check(&TokenKind::Indent) {
            self.advance();
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn end_block(&mut self) {
        if self.check(&TokenKind::Dedent) {
            self.advance();
        }
    }

    /// Skip blank structure and report whether the enclosing block is done.
    fn block_done(&mut self) -> bool {
        self.skip_newlines();
        self.check(&TokenKind::Dedent) || self.is_at_end()
    }

    /// Discard tokens up to the next NEWLINE at the current indentation
    /// depth, so parsing can resume with the next sibling statement. The
    /// DEDENT that closes the current block is left for the caller.
    fn synchronize(&mut self) {
        let mut depth = 0usize;
        loop {
            match &self.current().kind {
                TokenKind::Eof => break,
                TokenKind::Newline if depth == 0 => {
                    self.advance();
                    break;
                }
                TokenKind::Indent => {
                    depth += 1;
                    self.advance();
                }
                TokenKind::Dedent => {
                    if depth == 0 {
                        break;
                    }
                    depth -= 1;
                    self.advance();
                }
                _ => self.advance(),
            }
        }
    }

    fn skip_newlines(&mut self) {
        while self.check(&TokenKind::Newline) {
            self.advance();
        }
    }

    /// Skip layout tokens inside bracketed lists, which may wrap lines.
    fn skip_layout(&mut self) {
        while matches!(
            self.current().kind,
            TokenKind::Newline | TokenKind::Indent | TokenKind::Dedent
        ) {
            self.advance();
        }
    }

    /// Skip separators between top-level statements.
    fn skip_statement_separators(&mut self) {
        while matches!(self.current().kind, TokenKind::Newline | TokenKind::Dedent) {
            self.advance();
        }
    }

    // ========================================================================
    // Token helpers
    // ========================================================================

    fn current(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn advance(&mut self) {
        if !self.is_at_end() {
            self.pos += 1;
        }
    }

    fn is_at_end(&self) -> bool {
        self.current().kind == TokenKind::Eof
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.current().kind) == std::mem::discriminant(kind)
    }

    fn expect(&mut self, kind: TokenKind) -> Result<(), ParseError> {
        if self.check(&kind) {
            self.advance();
            Ok(())
        } else {
            Err(self.error(&format!(
                "expected {}, found {}",
                kind,
                self.current().kind
            )))
        }
    }

    fn expect_identifier(&mut self) -> Result<String, ParseError> {
        match &self.current().kind {
            TokenKind::Identifier(s) => {
                let s = s.clone();
                self.advance();
                Ok(s)
            }
            other => Err(self.error(&format!("expected identifier, found {}", other))),
        }
    }

    fn expect_string(&mut self) -> Result<String, ParseError> {
        match &self.current().kind {
            TokenKind::Str(s) => {
                let s = s.clone();
                self.advance();
                Ok(s)
            }
            other => Err(self.error(&format!("expected string literal, found {}", other))),
        }
    }

    /// Expect an identifier or a keyword usable as a plain name (stack and
    /// config keys, dotted path segments).
    fn expect_key(&mut self) -> Result<String, ParseError> {
        if let TokenKind::Identifier(s) = &self.current().kind {
            let s = s.clone();
            self.advance();
            return Ok(s);
        }
        if let Some(text) = self.current().kind.keyword_text() {
            let text = text.to_string();
            self.advance();
            return Ok(text);
        }
        Err(self.error(&format!(
            "expected name, found {}",
            self.current().kind
        )))
    }

    /// Expect a name given as an identifier, a keyword, or a quoted string.
    fn expect_name(&mut self) -> Result<String, ParseError> {
        if let TokenKind::Str(s) = &self.current().kind {
            let s = s.clone();
            self.advance();
            return Ok(s);
        }
        self.expect_key()
    }

    fn report(&mut self, err: ParseError) {
        self.reporter.error(err.message, err.line, err.column);
    }

    fn error(&self, msg: &str) -> ParseError {
        let span = self.current().span;
        ParseError {
            message: msg.to_string(),
            line: span.line,
            column: span.column,
        }
    }
}

fn split_endpoint(raw: &str) -> Option<(String, String)> {
    let (method, path) = raw.split_once(' ')?;
    if method.is_empty() || path.trim().is_empty() {
        return None;
    }
    Some((method.to_string(), path.trim().to_string()))
}

pub(crate) fn escape_string(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\t', "\\t")
        .replace('\r', "\\r")
}

// ============================================================================
// CONVENIENCE FUNCTIONS
// ============================================================================

/// Lex and parse source text into a document plus accumulated diagnostics.
pub fn parse(source: &str) -> (Document, Vec<Diagnostic>) {
    let mut reporter = ErrorReporter::new();
    let tokens = Lexer::new(source).tokenize(&mut reporter);
    let document = Parser::new(tokens, &mut reporter).parse_document();
    (document, reporter.into_diagnostics())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_clean(source: &str) -> Document {
        let (document, diagnostics) = parse(source);
        assert!(
            diagnostics.is_empty(),
            "unexpected diagnostics: {:?}",
            diagnostics
        );
        document
    }

    #[test]
    fn parse_system_with_stack_and_intent() {
        let source = r#"
system "TodoApp":
  version = "1.0.0"
  stack:
    language = "Rust"
    web = "axum"
  intent:
    primary = "Track todos"
    outcomes = ["create todos", "list todos"]
    out_of_scope = ["billing"]
"#;
        let document = parse_clean(source);
        assert_eq!(document.statements.len(), 1);
        let Statement::System(system) = &document.statements[0] else {
            panic!("expected system");
        };
        assert_eq!(system.name, "TodoApp");
        assert_eq!(system.version.as_deref(), Some("1.0.0"));
        assert_eq!(system.stack.len(), 2);
        assert_eq!(system.stack[1].key, "web");
        let intent = system.intent.as_ref().expect("intent");
        assert_eq!(intent.primary.as_deref(), Some("Track todos"));
        assert_eq!(intent.outcomes.as_ref().map(|o| o.len()), Some(2));
    }

    #[test]
    fn parse_interface_with_methods() {
        let source = r#"
interface TodoStore:
  doc = "Storage contract"
  method create(data: TodoInput) -> Todo
  method list() -> List[Todo]
  method find(id: UUID) -> Todo?
  invariants:
    invariant "ids are unique"
"#;
        let document = parse_clean(source);
        let Statement::Interface(iface) = &document.statements[0] else {
            panic!("expected interface");
        };
        assert_eq!(iface.methods.len(), 3);
        assert_eq!(
            iface.methods[1].return_type,
            TypeRef::Generic {
                base: "List".to_string(),
                args: vec![TypeRef::Named("Todo".to_string())],
            }
        );
        assert_eq!(
            iface.methods[2].return_type,
            TypeRef::Optional(Box::new(TypeRef::Named("Todo".to_string())))
        );
        assert_eq!(iface.invariants, vec!["ids are unique".to_string()]);
    }

    #[test]
    fn parse_interface_extends_with_override() {
        let source = r#"
interface Versioned extends TodoStore:
  override method create(data: TodoInput) -> VersionedTodo
  method history(id: UUID) -> List[Todo]
"#;
        let document = parse_clean(source);
        let Statement::Interface(iface) = &document.statements[0] else {
            panic!("expected interface");
        };
        assert_eq!(iface.extends.as_deref(), Some("TodoStore"));
        assert!(iface.methods[0].is_override);
        assert!(!iface.methods[1].is_override);
    }

    #[test]
    fn parse_module_full() {
        let source = r#"
module TodoService:
  doc = "Core todo behavior"
  owns = ["todo lifecycle"]
  requires = [TodoStore]
  implements = [TodoApi]
  exports = [TodoApi]
  api:
    endpoint "GET /todos" -> List[Todo] 200
    endpoint "POST /todos" -> Todo 201
    websocket "/ws/todos" -> TodoEvent
    command "reindex" -> Report
    model Todo:
      field id: UUID
      field title: str
      field done: bool
  contract:
    method list() -> List[Todo]
  invariants:
    invariant "no orphan todos"
  acceptance:
    test "lists todos in insertion order"
  artifacts = ["src/todo/*.rs"]
  config:
    max_items = 100
    store = "postgres"
    strict = true
"#;
        let document = parse_clean(source);
        let Statement::Module(module) = &document.statements[0] else {
            panic!("expected module");
        };
        assert_eq!(module.owns.len(), 1);
        assert_eq!(module.requires[0].name, "TodoStore");
        let api = module.api.as_ref().expect("api block");
        assert_eq!(api.entries.len(), 5);
        let ApiEntry::Endpoint(first) = &api.entries[0] else {
            panic!("expected endpoint");
        };
        assert_eq!(first.method, "GET");
        assert_eq!(first.path, "/todos");
        assert_eq!(first.status, Some(200));
        let ApiEntry::Model(model) = &api.entries[4] else {
            panic!("expected model");
        };
        assert_eq!(model.fields.len(), 3);
        assert_eq!(module.contract.len(), 1);
        assert_eq!(module.config.len(), 3);
        assert_eq!(module.config[0].value, ConfigValue::Number(100.0));
        assert_eq!(module.config[2].value, ConfigValue::Bool(true));
    }

    #[test]
    fn parse_policy_both_severity_forms() {
        let source = r#"
policy Security:
  rule "no plaintext secrets" severity=critical
  rule "rate limit all endpoints" [high]
"#;
        let document = parse_clean(source);
        let Statement::Policy(policy) = &document.statements[0] else {
            panic!("expected policy");
        };
        assert_eq!(policy.rules[0].severity, "critical");
        assert_eq!(policy.rules[1].severity, "high");
    }

    #[test]
    fn parse_pipeline_steps() {
        let source = r#"
pipeline "build":
  step design:
    modules = [TodoService]
    output = design
  step implement:
    modules = [TodoService, TodoStoreModule]
    output = code
    require = "design approved"
    gate = "review"
"#;
        let document = parse_clean(source);
        let Statement::Pipeline(pipeline) = &document.statements[0] else {
            panic!("expected pipeline");
        };
        assert_eq!(pipeline.steps.len(), 2);
        assert_eq!(
            pipeline.steps[0].output.as_ref().map(|o| o.name.as_str()),
            Some("design")
        );
        assert_eq!(pipeline.steps[1].modules.len(), 2);
    }

    #[test]
    fn parse_template_with_edits() {
        let source = r#"
system "App" extends "Base":
  override stack.language = "Rust"
  append stack.tools += "cargo"
  remove stack.tools -= "pip"
  replace block Security:
    policy Security:
      rule "managed secrets only" severity=critical
"#;
        let document = parse_clean(source);
        let Statement::System(system) = &document.statements[0] else {
            panic!("expected system");
        };
        assert_eq!(system.extends.as_deref(), Some("Base"));
        assert_eq!(system.edits.len(), 4);
        assert!(matches!(
            &system.edits[0],
            EditOp::Override { path, value, .. }
                if path == &vec!["stack".to_string(), "language".to_string()]
                    && value == "Rust"
        ));
        assert!(matches!(&system.edits[3], EditOp::Replace { name, .. } if name == "Security"));
    }

    #[test]
    fn parse_nested_declarations_in_system() {
        let source = r#"
system "Shop":
  interface Catalog:
    method list() -> List[Item]
  module CatalogService:
    implements = [Catalog]
  policy Rules:
    rule "audit everything" severity=low
  pipeline "ship":
    step all:
      modules = [CatalogService]
      output = code
"#;
        let document = parse_clean(source);
        let Statement::System(system) = &document.statements[0] else {
            panic!("expected system");
        };
        assert_eq!(system.interfaces.len(), 1);
        assert_eq!(system.modules.len(), 1);
        assert_eq!(system.policies.len(), 1);
        assert_eq!(system.pipelines.len(), 1);
    }

    #[test]
    fn multiline_lists() {
        let source = "module M:\n  owns = [\n    \"a\",\n    \"b\"\n  ]\n  requires = [X]\n";
        let document = parse_clean(source);
        let Statement::Module(module) = &document.statements[0] else {
            panic!("expected module");
        };
        assert_eq!(module.owns, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(module.requires[0].name, "X");
    }

    #[test]
    fn recovery_keeps_siblings() {
        let source = r#"
module Good:
  owns = ["works"]
module Bad:
  owns = 42
  requires = [X]
module AlsoGood:
  owns = ["fine"]
"#;
        let (document, diagnostics) = parse(source);
        assert!(!diagnostics.is_empty());
        assert_eq!(document.statements.len(), 3);
        let Statement::Module(bad) = &document.statements[1] else {
            panic!("expected module");
        };
        // The statement after the bad line inside the same block survived.
        assert_eq!(bad.requires.len(), 1);
    }

    #[test]
    fn recovery_at_top_level() {
        let source = "garbage here\nmodule M:\n  owns = [\"x\"]\n";
        let (document, diagnostics) = parse(source);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(document.statements.len(), 1);
    }

    #[test]
    fn type_annotations() {
        let source = "interface I:\n  method f(a: Map[str, List[int]], b: int?) -> Result[T, E]\n";
        let document = parse_clean(source);
        let Statement::Interface(iface) = &document.statements[0] else {
            panic!("expected interface");
        };
        let sig = &iface.methods[0];
        assert_eq!(sig.params[0].ty.to_string(), "Map[str, List[int]]");
        assert_eq!(sig.params[1].ty.to_string(), "int?");
        assert_eq!(sig.return_type.to_string(), "Result[T, E]");
    }

    #[test]
    fn invalid_endpoint_format_reported() {
        let source = "module M:\n  api:\n    endpoint \"no-space\" -> str\n";
        let (_, diagnostics) = parse(source);
        assert!(diagnostics
            .iter()
            .any(|d| d.message.contains("invalid endpoint format")));
    }

    mod round_trip {
        use super::*;
        use crate::pretty_printer::pretty_print;
        use proptest::prelude::*;

        fn arb_name() -> impl Strategy<Value = String> {
            "[a-z][a-z0-9_]{0,8}".prop_map(|s| s)
        }

        fn arb_type_name() -> impl Strategy<Value = String> {
            "[A-Z][a-zA-Z0-9]{0,8}".prop_map(|s| s)
        }

        fn arb_type(depth: u32) -> BoxedStrategy<TypeRef> {
            let leaf = arb_type_name().prop_map(TypeRef::Named).boxed();
            if depth == 0 {
                return leaf;
            }
            prop_oneof![
                leaf,
                (
                    arb_type_name(),
                    prop::collection::vec(arb_type(depth - 1), 1..3)
                )
                    .prop_map(|(base, args)| TypeRef::Generic { base, args }),
                arb_type(depth - 1).prop_map(|t| TypeRef::Optional(Box::new(t))),
            ]
            .boxed()
        }

        fn arb_method() -> impl Strategy<Value = MethodSig> {
            (
                arb_name(),
                prop::collection::vec((arb_name(), arb_type(1)), 0..3),
                arb_type(1),
            )
                .prop_map(|(name, params, return_type)| MethodSig {
                    name,
                    params: params
                        .into_iter()
                        .map(|(name, ty)| Param { name, ty })
                        .collect(),
                    return_type,
                    is_override: false,
                    span: Default::default(),
                })
        }

        fn arb_interface() -> impl Strategy<Value = InterfaceDecl> {
            (
                arb_type_name(),
                prop::collection::vec(arb_method(), 0..4),
                prop::collection::vec("[a-z ]{1,20}", 0..3),
            )
                .prop_map(|(name, mut methods, invariants)| {
                    // Suffix method names so generated interfaces never
                    // carry accidental duplicates.
                    for (i, m) in methods.iter_mut().enumerate() {
                        m.name = format!("{}{}", m.name, i);
                    }
                    InterfaceDecl {
                        name,
                        doc: None,
                        extends: None,
                        methods,
                        invariants: invariants.into_iter().map(|s| s.trim().to_string()).collect(),
                        span: Default::default(),
                    }
                })
        }

        proptest! {
            #[test]
            fn interface_round_trip(iface in arb_interface()) {
                let document = Document {
                    statements: vec![Statement::Interface(iface)],
                };
                let source = pretty_print(&document);
                let (reparsed, diagnostics) = parse(&source);
                prop_assert!(diagnostics.is_empty(), "diagnostics: {:?}\nsource:\n{}", diagnostics, source);
                prop_assert_eq!(strip_spans(reparsed), strip_spans(document));
            }
        }

        /// Structural comparison ignores spans, which differ by position.
        fn strip_spans(mut document: Document) -> Document {
            for stmt in &mut document.statements {
                if let Statement::Interface(iface) = stmt {
                    iface.span = Default::default();
                    for m in &mut iface.methods {
                        m.span = Default::default();
                    }
                }
            }
            document
        }
    }
}
