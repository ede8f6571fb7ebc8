//! Compiler entry points
//!
//! The public surface of the crate: [`compile`] runs the full
//! lex → parse → analyze pipeline, [`validate_syntax`] stops after the
//! parser, and [`structure_summary`] projects a resolved program for
//! reporting tools. Each call owns its own reporter and builds a fresh
//! token stream, AST, and symbol table, so independent compilations can
//! run in parallel with no shared state. Malformed input never raises;
//! it becomes diagnostics on the result.

use crate::analyzer::{self, ResolvedProgram};
use crate::errors::{Diagnostic, ErrorReporter};
use crate::lexer::Lexer;
use crate::parser::ast::*;
use crate::parser::walk::{self, Visitor};
use crate::parser::Parser;
use serde::{Deserialize, Serialize};

/// Result of a full compilation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompileResult {
    /// Display name of the compiled unit (file name or `"<input>"`).
    pub name: String,
    /// True when no error-severity diagnostic was produced.
    pub success: bool,
    pub diagnostics: Vec<Diagnostic>,
    /// Best-effort resolved program, present even when `success` is false
    /// so tooling can inspect partial structure.
    pub program: Option<ResolvedProgram>,
}

/// Compile source text: lexing, parsing, and semantic analysis.
pub fn compile(source: &str, display_name: &str) -> CompileResult {
    let mut reporter = ErrorReporter::new();
    let tokens = Lexer::new(source).tokenize(&mut reporter);
    let document = Parser::new(tokens, &mut reporter).parse_document();
    let program = analyzer::analyze(&document, &mut reporter);
    let success = !reporter.has_errors();

    CompileResult {
        name: display_name.to_string(),
        success,
        diagnostics: reporter.into_diagnostics(),
        program: Some(program),
    }
}

/// Result of a syntax-only validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntaxCheck {
    pub valid: bool,
    pub diagnostics: Vec<Diagnostic>,
    pub line_count: usize,
}

/// Run the lexer and parser only. Semantic concerns (references,
/// severities, cycles) are not checked here.
pub fn validate_syntax(source: &str) -> SyntaxCheck {
    let mut reporter = ErrorReporter::new();
    let tokens = Lexer::new(source).tokenize(&mut reporter);
    let _document = Parser::new(tokens, &mut reporter).parse_document();

    SyntaxCheck {
        valid: !reporter.has_errors(),
        diagnostics: reporter.into_diagnostics(),
        line_count: source.split('\n').count(),
    }
}

/// Read-only projection of a resolved program for reporting tools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureSummary {
    pub system_count: usize,
    pub interface_count: usize,
    pub module_count: usize,
    pub pipeline_count: usize,
    pub per_system: Vec<SystemSummary>,
}

/// Counts within one system's merged view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemSummary {
    pub name: String,
    pub interface_count: usize,
    pub module_count: usize,
    pub policy_count: usize,
    pub pipeline_count: usize,
}

/// Summarize a resolved program: declaration counts across the whole
/// document (top-level and nested), plus per-system counts over the
/// merged views.
pub fn structure_summary(program: &ResolvedProgram) -> StructureSummary {
    #[derive(Default)]
    struct Counts {
        systems: usize,
        interfaces: usize,
        modules: usize,
        pipelines: usize,
    }

    impl Visitor for Counts {
        fn visit_system(&mut self, _decl: &SystemDecl) {
            self.systems += 1;
        }
        fn visit_interface(&mut self, _decl: &InterfaceDecl) {
            self.interfaces += 1;
        }
        fn visit_module(&mut self, _decl: &ModuleDecl) {
            self.modules += 1;
        }
        fn visit_pipeline(&mut self, _decl: &PipelineDecl) {
            self.pipelines += 1;
        }
    }

    let mut counts = Counts::default();
    walk::walk_document(&mut counts, &program.document);

    StructureSummary {
        system_count: counts.systems,
        interface_count: counts.interfaces,
        module_count: counts.modules,
        pipeline_count: counts.pipelines,
        per_system: program
            .systems
            .iter()
            .map(|system| SystemSummary {
                name: system.name.clone(),
                interface_count: system.interfaces.len(),
                module_count: system.modules.len(),
                policy_count: system.policies.len(),
                pipeline_count: system.pipelines.len(),
            })
            .collect(),
    }
}
