//! Semantic analysis
//!
//! Two passes over the parsed document. The collection pass registers
//! every named declaration into a symbol table scoped by
//! (kind, enclosing-system-or-global), keeping the first-seen definition
//! authoritative on duplicates. The resolution pass then resolves
//! cross-references (forward references included), merges inheritance
//! chains, validates the module dependency graph, verifies
//! interface-implementation completeness, and checks closed-set fields.
//!
//! Analysis never stops at the first error: every check runs, and a
//! best-effort [`ResolvedProgram`] is always produced so callers can
//! inspect partial structure.

pub mod contracts;
pub mod graph;
pub mod merge;

pub use merge::{ResolvedIntent, ResolvedInterface, ResolvedStackEntry, StackValue, SystemView};

use crate::errors::ErrorReporter;
use crate::lexer::Span;
use crate::parser::ast::*;
use crate::parser::walk::{self, Visitor};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Permitted rule severities.
pub const SEVERITY_LEVELS: [&str; 4] = ["critical", "high", "medium", "low"];

/// Permitted pipeline step output kinds.
pub const OUTPUT_KINDS: [&str; 5] = ["design", "code", "tests", "diff", "docs"];

/// Type names that never warrant an unknown-type warning.
const BUILTIN_TYPES: [&str; 13] = [
    "str", "int", "float", "bool", "UUID", "datetime", "Any", "List", "Dict", "Map", "Set",
    "Optional", "Result",
];

/// The document after symbol resolution, inheritance merge, and dependency
/// validation.
///
/// The original text-order declarations are retained alongside the
/// resolved views, so diagnostics keep their positions and re-analysis is
/// idempotent. Declarations touched by semantic errors still appear here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedProgram {
    pub document: Document,
    pub systems: Vec<ResolvedSystem>,
    pub interfaces: Vec<ResolvedInterface>,
}

/// A system declaration with its inheritance chain merged in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedSystem {
    pub name: String,
    pub version: Option<String>,
    pub stack: Vec<ResolvedStackEntry>,
    pub intent: ResolvedIntent,
    pub interfaces: Vec<InterfaceDecl>,
    pub modules: Vec<ModuleDecl>,
    pub policies: Vec<PolicyDecl>,
    pub pipelines: Vec<PipelineDecl>,
}

impl ResolvedSystem {
    fn new(name: String, view: SystemView) -> Self {
        Self {
            name,
            version: view.version,
            stack: view.stack,
            intent: view.intent,
            interfaces: view.interfaces,
            modules: view.modules,
            policies: view.policies,
            pipelines: view.pipelines,
        }
    }
}

/// Analyze a parsed document, appending diagnostics to `reporter`.
pub fn analyze(document: &Document, reporter: &mut ErrorReporter) -> ResolvedProgram {
    let symbols = SymbolTable::collect(document, reporter);
    Resolver::new(&symbols, reporter).run(document)
}

// ============================================================================
// COLLECTION PASS
// ============================================================================

type ScopedName = (Option<String>, String);

#[derive(Default)]
struct SymbolTable<'d> {
    templates: HashMap<String, &'d SystemDecl>,
    interfaces: HashMap<ScopedName, &'d InterfaceDecl>,
    /// First-seen interfaces in document order, for resolved output.
    interface_list: Vec<(Option<String>, &'d InterfaceDecl)>,
    module_index: HashMap<ScopedName, usize>,
    modules: Vec<(Option<String>, &'d ModuleDecl)>,
    pipelines: Vec<(Option<String>, &'d PipelineDecl)>,
    declared: HashSet<(&'static str, Option<String>, String)>,
}

impl<'d> SymbolTable<'d> {
    fn collect(document: &'d Document, reporter: &mut ErrorReporter) -> Self {
        let mut table = Self::default();
        for statement in &document.statements {
            table.collect_statement(None, statement, reporter);
        }
        table
    }

    fn collect_statement(
        &mut self,
        scope: Option<&str>,
        statement: &'d Statement,
        reporter: &mut ErrorReporter,
    ) {
        match statement {
            Statement::Template(decl) => {
                if self.declare("template", scope, &decl.name, decl.span, reporter)
                    && scope.is_none()
                {
                    self.templates.insert(decl.name.clone(), decl);
                }
                self.collect_nested(decl, reporter);
            }
            Statement::System(decl) => {
                self.declare("system", scope, &decl.name, decl.span, reporter);
                self.collect_nested(decl, reporter);
            }
            Statement::Interface(decl) => self.declare_interface(scope, decl, reporter),
            Statement::Module(decl) => self.declare_module(scope, decl, reporter),
            Statement::Policy(decl) => {
                self.declare("policy", scope, &decl.name, decl.span, reporter);
            }
            Statement::Pipeline(decl) => self.declare_pipeline(scope, decl, reporter),
        }
    }

    /// Register a system's (or template's) nested declarations under its
    /// own scope. Replace-edit payloads are declared in the child's scope
    /// too: they are part of the child's body.
    fn collect_nested(&mut self, decl: &'d SystemDecl, reporter: &mut ErrorReporter) {
        let scope = Some(decl.name.as_str());
        for iface in &decl.interfaces {
            self.declare_interface(scope, iface, reporter);
        }
        for module in &decl.modules {
            self.declare_module(scope, module, reporter);
        }
        for policy in &decl.policies {
            self.declare("policy", scope, &policy.name, policy.span, reporter);
        }
        for pipeline in &decl.pipelines {
            self.declare_pipeline(scope, pipeline, reporter);
        }
        for edit in &decl.edits {
            if let EditOp::Replace { block, .. } = edit {
                self.collect_statement(scope, block, reporter);
            }
        }
    }

    fn declare_interface(
        &mut self,
        scope: Option<&str>,
        decl: &'d InterfaceDecl,
        reporter: &mut ErrorReporter,
    ) {
        if self.declare("interface", scope, &decl.name, decl.span, reporter) {
            let owned_scope = scope.map(str::to_string);
            self.interfaces
                .insert((owned_scope.clone(), decl.name.clone()), decl);
            self.interface_list.push((owned_scope, decl));
        }
    }

    fn declare_module(
        &mut self,
        scope: Option<&str>,
        decl: &'d ModuleDecl,
        reporter: &mut ErrorReporter,
    ) {
        if self.declare("module", scope, &decl.name, decl.span, reporter) {
            let owned_scope = scope.map(str::to_string);
            self.module_index
                .insert((owned_scope.clone(), decl.name.clone()), self.modules.len());
            self.modules.push((owned_scope, decl));
        }
    }

    fn declare_pipeline(
        &mut self,
        scope: Option<&str>,
        decl: &'d PipelineDecl,
        reporter: &mut ErrorReporter,
    ) {
        if self.declare("pipeline", scope, &decl.name, decl.span, reporter) {
            self.pipelines.push((scope.map(str::to_string), decl));
        }
    }

    /// Register a name in its (kind, scope) namespace. Returns false for a
    /// duplicate, which is reported but keeps the first definition
    /// authoritative.
    fn declare(
        &mut self,
        kind: &'static str,
        scope: Option<&str>,
        name: &str,
        span: Span,
        reporter: &mut ErrorReporter,
    ) -> bool {
        let key = (kind, scope.map(str::to_string), name.to_string());
        if self.declared.contains(&key) {
            reporter.error(format!("duplicate name '{}'", name), span.line, span.column);
            false
        } else {
            self.declared.insert(key);
            true
        }
    }

    /// Scope-local lookup first, then global.
    fn interface(&self, scope: Option<&str>, name: &str) -> Option<&'d InterfaceDecl> {
        self.interface_with_scope(scope, name).map(|(_, decl)| decl)
    }

    fn interface_with_scope(
        &self,
        scope: Option<&str>,
        name: &str,
    ) -> Option<(Option<String>, &'d InterfaceDecl)> {
        if let Some(s) = scope {
            if let Some(decl) = self.interfaces.get(&(Some(s.to_string()), name.to_string())) {
                return Some((Some(s.to_string()), *decl));
            }
        }
        self.interfaces
            .get(&(None, name.to_string()))
            .map(|decl| (None, *decl))
    }

    fn module(&self, scope: Option<&str>, name: &str) -> Option<usize> {
        if let Some(s) = scope {
            if let Some(&index) = self.module_index.get(&(Some(s.to_string()), name.to_string())) {
                return Some(index);
            }
        }
        self.module_index.get(&(None, name.to_string())).copied()
    }

    /// Indices of every visible module that implements or exports `name`.
    fn providers(&self, scope: Option<&str>, name: &str) -> Vec<usize> {
        self.modules
            .iter()
            .enumerate()
            .filter(|(_, (module_scope, module))| {
                scope_visible(module_scope, scope)
                    && module
                        .implements
                        .iter()
                        .chain(module.exports.iter())
                        .any(|r| r.name == name)
            })
            .map(|(index, _)| index)
            .collect()
    }
}

fn scope_visible(decl_scope: &Option<String>, from: Option<&str>) -> bool {
    match decl_scope {
        None => true,
        Some(s) => Some(s.as_str()) == from,
    }
}

// ============================================================================
// RESOLUTION PASS
// ============================================================================

struct Resolver<'d, 'r> {
    symbols: &'r SymbolTable<'d>,
    reporter: &'r mut ErrorReporter,
    /// Memoized template views; `None` marks a template excluded by an
    /// inheritance cycle.
    template_views: HashMap<String, Option<SystemView>>,
    interface_views: HashMap<ScopedName, Option<ResolvedInterface>>,
}

impl<'d, 'r> Resolver<'d, 'r> {
    fn new(symbols: &'r SymbolTable<'d>, reporter: &'r mut ErrorReporter) -> Self {
        Self {
            symbols,
            reporter,
            template_views: HashMap::new(),
            interface_views: HashMap::new(),
        }
    }

    fn run(mut self, document: &Document) -> ResolvedProgram {
        // Resolve every template chain up front so extends-cycles surface
        // exactly once, before any dependent merge.
        let template_names: Vec<String> = document
            .statements
            .iter()
            .filter_map(|s| match s {
                Statement::Template(decl) => Some(decl.name.clone()),
                _ => None,
            })
            .collect();
        for name in &template_names {
            self.template_view(name, &mut Vec::new());
        }

        let mut systems = Vec::new();
        for statement in &document.statements {
            if let Statement::System(decl) = statement {
                let parent = self.parent_view(decl);
                let view = merge::merge_system(parent.as_ref(), decl, self.reporter);
                systems.push(ResolvedSystem::new(decl.name.clone(), view));
            }
        }

        let interface_names: Vec<(Option<String>, String)> = self
            .symbols
            .interface_list
            .iter()
            .map(|(scope, decl)| (scope.clone(), decl.name.clone()))
            .collect();
        let mut interfaces = Vec::new();
        for (scope, name) in &interface_names {
            if let Some(view) = self.interface_view(scope.as_deref(), name, &mut Vec::new()) {
                interfaces.push(view);
            }
        }

        let modules = self.symbols.modules.clone();
        for (scope, module) in &modules {
            self.check_module(scope.as_deref(), module);
        }

        let nodes = self.dependency_nodes();
        graph::report_cycles(&nodes, self.reporter);

        let pipelines = self.symbols.pipelines.clone();
        for (scope, pipeline) in &pipelines {
            self.check_pipeline(scope.as_deref(), pipeline);
        }

        let known_types = collect_known_type_names(document);
        let mut lint = LintPass {
            known_types,
            reporter: self.reporter,
        };
        walk::walk_document(&mut lint, document);

        ResolvedProgram {
            document: document.clone(),
            systems,
            interfaces,
        }
    }

    fn parent_view(&mut self, decl: &SystemDecl) -> Option<SystemView> {
        let parent = decl.extends.as_ref()?;
        if self.symbols.templates.contains_key(parent) {
            self.template_view(parent, &mut Vec::new())
        } else {
            self.reporter.error(
                format!(
                    "undefined reference to '{}' in system '{}'",
                    parent, decl.name
                ),
                decl.span.line,
                decl.span.column,
            );
            None
        }
    }

    /// Resolve a template's merged view, walking the `extends` chain with a
    /// visiting set so cycles are caught before any merge work.
    fn template_view(&mut self, name: &str, visiting: &mut Vec<String>) -> Option<SystemView> {
        if let Some(state) = self.template_views.get(name) {
            return state.clone();
        }
        let decl = self.symbols.templates.get(name).copied()?;

        if visiting.iter().any(|n| n == name) {
            self.reporter.error(
                format!("circular template inheritance involving '{}'", name),
                decl.span.line,
                decl.span.column,
            );
            self.template_views.insert(name.to_string(), None);
            return None;
        }

        visiting.push(name.to_string());
        let parent = match &decl.extends {
            Some(parent_name) => {
                if self.symbols.templates.contains_key(parent_name) {
                    self.template_view(parent_name, visiting)
                } else {
                    self.reporter.error(
                        format!(
                            "undefined reference to '{}' in template '{}'",
                            parent_name, decl.name
                        ),
                        decl.span.line,
                        decl.span.column,
                    );
                    None
                }
            }
            None => None,
        };
        visiting.pop();

        let view = merge::merge_system(parent.as_ref(), decl, self.reporter);
        // A cycle detected deeper in the chain marked this template failed
        // already; keep that verdict.
        self.template_views
            .entry(name.to_string())
            .or_insert(Some(view))
            .clone()
    }

    /// Resolve an interface's flattened method set through its `extends`
    /// chain.
    fn interface_view(
        &mut self,
        scope: Option<&str>,
        name: &str,
        visiting: &mut Vec<String>,
    ) -> Option<ResolvedInterface> {
        let (actual_scope, decl) = self.symbols.interface_with_scope(scope, name)?;
        let key = (actual_scope.clone(), name.to_string());
        if let Some(state) = self.interface_views.get(&key) {
            return state.clone();
        }

        let visit_key = format!("{}::{}", actual_scope.as_deref().unwrap_or(""), name);
        if visiting.contains(&visit_key) {
            self.reporter.error(
                format!("circular interface inheritance involving '{}'", name),
                decl.span.line,
                decl.span.column,
            );
            self.interface_views.insert(key, None);
            return None;
        }

        visiting.push(visit_key);
        let parent = match &decl.extends {
            Some(parent_name) => {
                if self
                    .symbols
                    .interface_with_scope(actual_scope.as_deref(), parent_name)
                    .is_some()
                {
                    self.interface_view(actual_scope.as_deref(), parent_name, visiting)
                } else {
                    self.reporter.error(
                        format!(
                            "undefined reference to '{}' in interface '{}'",
                            parent_name, decl.name
                        ),
                        decl.span.line,
                        decl.span.column,
                    );
                    None
                }
            }
            None => None,
        };
        visiting.pop();

        let view = merge::merge_interface(parent.as_ref(), decl, actual_scope);
        self.interface_views.entry(key).or_insert(Some(view)).clone()
    }

    fn check_module(&mut self, scope: Option<&str>, module: &ModuleDecl) {
        for req in &module.requires {
            let resolvable = self.symbols.interface(scope, &req.name).is_some()
                || self.symbols.module(scope, &req.name).is_some()
                || !self.symbols.providers(scope, &req.name).is_empty();
            if !resolvable {
                self.reporter.error(
                    format!(
                        "unresolved requirement '{}' in module '{}'",
                        req.name, module.name
                    ),
                    req.span.line,
                    req.span.column,
                );
            }
        }

        for reference in module.implements.iter().chain(module.exports.iter()) {
            if self.symbols.interface(scope, &reference.name).is_none() {
                self.reporter.error(
                    format!(
                        "undefined reference to '{}' in module '{}'",
                        reference.name, module.name
                    ),
                    reference.span.line,
                    reference.span.column,
                );
            }
        }

        for impl_ref in &module.implements {
            let Some(view) = self.interface_view(scope, &impl_ref.name, &mut Vec::new()) else {
                continue;
            };
            let exported = module.exports.iter().any(|e| e.name == impl_ref.name);
            contracts::check_module_contract(module, &view, exported, self.reporter);
        }
    }

    /// Edges over module names: a requirement pointing at a module links to
    /// it directly; one pointing at an interface links to every visible
    /// provider of that interface.
    fn dependency_nodes(&self) -> Vec<graph::DepNode> {
        self.symbols
            .modules
            .iter()
            .map(|(scope, module)| {
                let mut deps = Vec::new();
                for req in &module.requires {
                    if let Some(target) = self.symbols.module(scope.as_deref(), &req.name) {
                        deps.push(target);
                    } else {
                        deps.extend(self.symbols.providers(scope.as_deref(), &req.name));
                    }
                }
                deps.sort_unstable();
                deps.dedup();
                graph::DepNode {
                    name: module.name.clone(),
                    span: module.span,
                    deps,
                }
            })
            .collect()
    }

    fn check_pipeline(&mut self, scope: Option<&str>, pipeline: &PipelineDecl) {
        for step in &pipeline.steps {
            for reference in &step.modules {
                if self.symbols.module(scope, &reference.name).is_none() {
                    self.reporter.error(
                        format!(
                            "undefined reference to '{}' in pipeline '{}'",
                            reference.name, pipeline.name
                        ),
                        reference.span.line,
                        reference.span.column,
                    );
                }
            }
        }
    }
}

// ============================================================================
// CLOSED SETS AND LOCAL CHECKS
// ============================================================================

fn collect_known_type_names(document: &Document) -> HashSet<String> {
    #[derive(Default)]
    struct Known(HashSet<String>);

    impl Visitor for Known {
        fn visit_interface(&mut self, decl: &InterfaceDecl) {
            self.0.insert(decl.name.clone());
        }
        fn visit_model(&mut self, decl: &ModelDecl) {
            self.0.insert(decl.name.clone());
        }
    }

    let mut known = Known::default();
    walk::walk_document(&mut known, document);
    known.0
}

/// Declaration-local checks that need no symbol resolution: closed-set
/// membership, duplicate model fields, duplicate method parameters, and
/// unknown-type warnings.
struct LintPass<'r> {
    known_types: HashSet<String>,
    reporter: &'r mut ErrorReporter,
}

impl LintPass<'_> {
    fn is_known(&self, name: &str) -> bool {
        BUILTIN_TYPES.contains(&name) || self.known_types.contains(name)
    }

    fn check_type(&mut self, ty: &TypeRef, span: Span) {
        match ty {
            TypeRef::Named(name) => {
                if !self.is_known(name) {
                    self.reporter
                        .warning(format!("unknown type '{}'", name), span.line, span.column);
                }
            }
            TypeRef::Generic { base, args } => {
                if !self.is_known(base) {
                    self.reporter
                        .warning(format!("unknown type '{}'", base), span.line, span.column);
                }
                for arg in args {
                    self.check_type(arg, span);
                }
            }
            TypeRef::Optional(inner) => self.check_type(inner, span),
        }
    }
}

impl Visitor for LintPass<'_> {
    fn visit_policy(&mut self, decl: &PolicyDecl) {
        for rule in &decl.rules {
            if !SEVERITY_LEVELS.contains(&rule.severity.as_str()) {
                self.reporter.error(
                    format!(
                        "invalid severity '{}' in policy '{}'",
                        rule.severity, decl.name
                    ),
                    rule.span.line,
                    rule.span.column,
                );
            }
        }
    }

    fn visit_pipeline(&mut self, decl: &PipelineDecl) {
        for step in &decl.steps {
            if let Some(output) = &step.output {
                if !OUTPUT_KINDS.contains(&output.name.as_str()) {
                    self.reporter.error(
                        format!("invalid output '{}' in step '{}'", output.name, step.name),
                        output.span.line,
                        output.span.column,
                    );
                }
            }
        }
    }

    fn visit_model(&mut self, decl: &ModelDecl) {
        let mut seen = HashSet::new();
        for field in &decl.fields {
            if !seen.insert(field.name.as_str()) {
                self.reporter.error(
                    format!("duplicate field '{}' in model '{}'", field.name, decl.name),
                    field.span.line,
                    field.span.column,
                );
            }
            self.check_type(&field.ty, field.span);
        }
    }

    fn visit_method(&mut self, sig: &MethodSig) {
        let mut seen = HashSet::new();
        for param in &sig.params {
            if !seen.insert(param.name.as_str()) {
                self.reporter.error(
                    format!(
                        "duplicate parameter '{}' in method '{}'",
                        param.name, sig.name
                    ),
                    sig.span.line,
                    sig.span.column,
                );
            }
            self.check_type(&param.ty, sig.span);
        }
        self.check_type(&sig.return_type, sig.span);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn analyze_source(source: &str) -> (ResolvedProgram, ErrorReporter) {
        let mut reporter = ErrorReporter::new();
        let tokens = crate::lexer::Lexer::new(source).tokenize(&mut reporter);
        let document = crate::parser::Parser::new(tokens, &mut reporter).parse_document();
        let program = analyze(&document, &mut reporter);
        (program, reporter)
    }

    #[test]
    fn forward_references_resolve() {
        let source = r#"
module M:
  requires = [Later]
interface Later:
  method f() -> int
"#;
        let (_, reporter) = analyze_source(source);
        assert!(
            !reporter.has_errors(),
            "diagnostics: {:?}",
            reporter.diagnostics()
        );
    }

    #[test]
    fn same_name_different_kind_is_not_a_duplicate() {
        let source = r#"
interface Billing:
  method charge(amount: int) -> bool
module Billing:
  implements = [Billing]
  contract:
    method charge(amount: int) -> bool
"#;
        let (_, reporter) = analyze_source(source);
        assert!(
            !reporter.has_errors(),
            "diagnostics: {:?}",
            reporter.diagnostics()
        );
    }

    #[test]
    fn scoped_names_do_not_collide_across_systems() {
        let source = r#"
system "A":
  module Core:
    owns = ["a"]
system "B":
  module Core:
    owns = ["b"]
"#;
        let (_, reporter) = analyze_source(source);
        assert!(
            !reporter.has_errors(),
            "diagnostics: {:?}",
            reporter.diagnostics()
        );
    }

    #[test]
    fn nested_module_sees_global_interface() {
        let source = r#"
interface Shared:
  method ping() -> bool
system "App":
  module Uses:
    requires = [Shared]
"#;
        let (_, reporter) = analyze_source(source);
        assert!(
            !reporter.has_errors(),
            "diagnostics: {:?}",
            reporter.diagnostics()
        );
    }

    #[test]
    fn parse_then_analyze_is_deterministic() {
        let source = r#"
template "Base":
  stack:
    language = "Rust"
system "App" extends "Base":
  append stack.tools += "cargo"
"#;
        let (document, diagnostics) = parse(source);
        assert!(diagnostics.is_empty());

        let mut first_reporter = ErrorReporter::new();
        let first = analyze(&document, &mut first_reporter);
        let mut second_reporter = ErrorReporter::new();
        let second = analyze(&document, &mut second_reporter);

        assert_eq!(first, second);
        assert_eq!(
            first_reporter.diagnostics(),
            second_reporter.diagnostics()
        );
    }
}
