//! Abstract Syntax Tree types
//!
//! Pure data: nodes own their children, hold no parent back-references, and
//! carry only a `span` for diagnostics. All behavior beyond traversal lives
//! in the parser and the semantic analyzer.

use crate::lexer::Span;
use serde::{Deserialize, Serialize};
use std::fmt;

// Spans are positional metadata, not document content; they stay out of
// the serialized form.
fn span_default() -> Span {
    Span::default()
}

/// The root AST node: every top-level declaration in source order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Document {
    pub statements: Vec<Statement>,
}

/// A top-level (or system-nested) declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Statement {
    Template(SystemDecl),
    System(SystemDecl),
    Interface(InterfaceDecl),
    Module(ModuleDecl),
    Policy(PolicyDecl),
    Pipeline(PipelineDecl),
}

impl Statement {
    /// The declared name of this statement.
    pub fn name(&self) -> &str {
        match self {
            Statement::Template(d) | Statement::System(d) => &d.name,
            Statement::Interface(d) => &d.name,
            Statement::Module(d) => &d.name,
            Statement::Policy(d) => &d.name,
            Statement::Pipeline(d) => &d.name,
        }
    }

    /// The declaration keyword, for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Statement::Template(_) => "template",
            Statement::System(_) => "system",
            Statement::Interface(_) => "interface",
            Statement::Module(_) => "module",
            Statement::Policy(_) => "policy",
            Statement::Pipeline(_) => "pipeline",
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Statement::Template(d) | Statement::System(d) => d.span,
            Statement::Interface(d) => d.span,
            Statement::Module(d) => d.span,
            Statement::Policy(d) => d.span,
            Statement::Pipeline(d) => d.span,
        }
    }
}

/// A `system "Name":` or `template "Name":` declaration.
///
/// Templates are reusable system prototypes; the two share one shape and
/// are distinguished by their [`Statement`] variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemDecl {
    pub name: String,
    pub extends: Option<String>,
    pub version: Option<String>,
    pub stack: Vec<StackEntry>,
    pub intent: Option<IntentDecl>,
    pub interfaces: Vec<InterfaceDecl>,
    pub modules: Vec<ModuleDecl>,
    pub policies: Vec<PolicyDecl>,
    pub pipelines: Vec<PipelineDecl>,
    /// Inheritance edits in body order; applied during semantic analysis.
    pub edits: Vec<EditOp>,
    #[serde(skip, default = "span_default")]
    pub span: Span,
}

/// One `key = "value"` entry inside a `stack:` block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackEntry {
    pub key: String,
    pub value: String,
    #[serde(skip, default = "span_default")]
    pub span: Span,
}

/// The `intent:` record of a system or template.
///
/// `None` list fields mean "not declared" (inherit), as opposed to a
/// declared-but-empty list, which replaces the parent's.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct IntentDecl {
    pub primary: Option<String>,
    pub outcomes: Option<Vec<String>>,
    pub out_of_scope: Option<Vec<String>>,
    #[serde(skip, default = "span_default")]
    pub span: Span,
}

/// An inheritance-edit statement inside a system/template body.
///
/// Edits are recorded in body order and applied during the merge step;
/// later edits of the same path win.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EditOp {
    /// `override path = "value"`
    Override {
        path: Vec<String>,
        value: String,
        #[serde(skip, default = "span_default")]
        span: Span,
    },
    /// `append path += "value"`
    Append {
        path: Vec<String>,
        value: String,
        #[serde(skip, default = "span_default")]
        span: Span,
    },
    /// `remove path -= "value"`
    Remove {
        path: Vec<String>,
        value: String,
        #[serde(skip, default = "span_default")]
        span: Span,
    },
    /// `replace block Name:` — swaps the parent's named block wholesale.
    Replace {
        name: String,
        block: Box<Statement>,
        #[serde(skip, default = "span_default")]
        span: Span,
    },
}

impl EditOp {
    pub fn span(&self) -> Span {
        match self {
            EditOp::Override { span, .. }
            | EditOp::Append { span, .. }
            | EditOp::Remove { span, .. }
            | EditOp::Replace { span, .. } => *span,
        }
    }
}

/// An `interface Name:` declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfaceDecl {
    pub name: String,
    pub doc: Option<String>,
    pub extends: Option<String>,
    pub methods: Vec<MethodSig>,
    pub invariants: Vec<String>,
    #[serde(skip, default = "span_default")]
    pub span: Span,
}

/// A method signature: `method name(p: Type, ...) -> Type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodSig {
    pub name: String,
    pub params: Vec<Param>,
    pub return_type: TypeRef,
    /// True for `override method ...` in an extending interface; replaces
    /// the inherited signature of the same name.
    pub is_override: bool,
    #[serde(skip, default = "span_default")]
    pub span: Span,
}

/// One `name: Type` parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub ty: TypeRef,
}

/// Structural representation of a declared type annotation.
///
/// Closed variant set so completeness checks can compare shapes instead of
/// strings: `User`, `List[User]`, `Map[str, int]`, `int?`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TypeRef {
    Named(String),
    Generic { base: String, args: Vec<TypeRef> },
    Optional(Box<TypeRef>),
}

impl TypeRef {
    /// The outermost base name (unwrapping `Optional`).
    pub fn base_name(&self) -> &str {
        match self {
            TypeRef::Named(name) => name,
            TypeRef::Generic { base, .. } => base,
            TypeRef::Optional(inner) => inner.base_name(),
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Named(name) => write!(f, "{}", name),
            TypeRef::Generic { base, args } => {
                write!(f, "{}[", base)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, "]")
            }
            TypeRef::Optional(inner) => write!(f, "{}?", inner),
        }
    }
}

/// A `module Name:` declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleDecl {
    pub name: String,
    pub doc: Option<String>,
    pub owns: Vec<String>,
    pub requires: Vec<NameRef>,
    pub implements: Vec<NameRef>,
    pub exports: Vec<NameRef>,
    pub api: Option<ApiDecl>,
    /// Declared behavior checked against `implements`.
    pub contract: Vec<MethodSig>,
    pub invariants: Vec<String>,
    pub acceptance: Vec<String>,
    pub artifacts: Vec<String>,
    pub config: Vec<ConfigEntry>,
    #[serde(skip, default = "span_default")]
    pub span: Span,
}

/// A by-name cross-reference, kept with its own span so diagnostics can
/// point at the reference rather than the whole declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NameRef {
    pub name: String,
    #[serde(skip, default = "span_default")]
    pub span: Span,
}

/// An `api:` block: ordered endpoints, websockets, commands, and models.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ApiDecl {
    pub entries: Vec<ApiEntry>,
    #[serde(skip, default = "span_default")]
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ApiEntry {
    Endpoint(EndpointDecl),
    Websocket(WebsocketDecl),
    Command(CommandDecl),
    Model(ModelDecl),
}

/// `endpoint "GET /todos" -> List[Todo] 200`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointDecl {
    pub method: String,
    pub path: String,
    pub returns: TypeRef,
    /// Optional trailing status code; parsed, not interpreted.
    pub status: Option<u16>,
    #[serde(skip, default = "span_default")]
    pub span: Span,
}

/// `websocket "/ws/events" -> Event`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebsocketDecl {
    pub path: String,
    pub returns: TypeRef,
    #[serde(skip, default = "span_default")]
    pub span: Span,
}

/// `command "sync" -> Report`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandDecl {
    pub name: String,
    pub returns: TypeRef,
    #[serde(skip, default = "span_default")]
    pub span: Span,
}

/// `model Name:` with typed fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDecl {
    pub name: String,
    pub fields: Vec<FieldDecl>,
    #[serde(skip, default = "span_default")]
    pub span: Span,
}

/// `field name: Type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDecl {
    pub name: String,
    pub ty: TypeRef,
    #[serde(skip, default = "span_default")]
    pub span: Span,
}

/// `key = scalar` inside a `config:` block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigEntry {
    pub key: String,
    pub value: ConfigValue,
    #[serde(skip, default = "span_default")]
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConfigValue {
    Str(String),
    Number(f64),
    Bool(bool),
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::Str(s) => write!(f, "\"{}\"", s),
            ConfigValue::Number(n) => write!(f, "{}", n),
            ConfigValue::Bool(b) => write!(f, "{}", b),
        }
    }
}

/// A `policy Name:` declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyDecl {
    pub name: String,
    pub rules: Vec<RuleDecl>,
    #[serde(skip, default = "span_default")]
    pub span: Span,
}

/// `rule "text" severity=level` (or the bracketed form `rule "text" [level]`).
///
/// The severity is kept as raw text here; membership in the closed set is a
/// semantic check, not a parse check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDecl {
    pub text: String,
    pub severity: String,
    #[serde(skip, default = "span_default")]
    pub span: Span,
}

/// A `pipeline "name":` declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineDecl {
    pub name: String,
    pub steps: Vec<StepDecl>,
    #[serde(skip, default = "span_default")]
    pub span: Span,
}

/// A `step name:` block inside a pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepDecl {
    pub name: String,
    pub modules: Vec<NameRef>,
    /// Raw output kind; validated against the closed set by the analyzer.
    pub output: Option<NameRef>,
    pub require: Option<String>,
    pub gate: Option<String>,
    #[serde(skip, default = "span_default")]
    pub span: Span,
}

// ============================================================================
// PARSE ERROR
// ============================================================================

/// Parse error with line/column information.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "parse error at line {}, column {}: {}",
            self.line, self.column, self.message
        )
    }
}

impl std::error::Error for ParseError {}
