use blueprint_dsl::{compile, structure_summary, validate_syntax, DiagnosticSeverity};

fn errors(result: &blueprint_dsl::CompileResult) -> Vec<String> {
    result
        .diagnostics
        .iter()
        .filter(|d| d.severity == DiagnosticSeverity::Error)
        .map(|d| d.message.clone())
        .collect()
}

#[test]
fn compiles_a_complete_document() {
    let source = r#"
template "ServiceBase":
  stack:
    language = "Rust"
    web = "axum"
  intent:
    primary = "reusable service defaults"

system "TodoApp" extends "ServiceBase":
  version = "1.0.0"
  override stack.web = "actix"
  intent:
    primary = "track todos end to end"
    outcomes = ["create todos", "query todos"]
    out_of_scope = ["billing"]

interface TodoStore:
  doc = "persistence contract"
  method save(item: TodoInput) -> UUID
  method find(id: UUID) -> Todo?
  method all() -> List[Todo]
  invariants:
    invariant "saved items are retrievable"

module Persistence:
  owns = ["todo storage"]
  implements = [TodoStore]
  exports = [TodoStore]
  contract:
    method save(item: TodoInput) -> UUID
    method find(id: UUID) -> Todo?
    method all() -> List[Todo]
  api:
    endpoint "GET /todos" -> List[Todo] 200
    endpoint "POST /todos" -> Todo 201
    model Todo:
      field id: UUID
      field title: str
      field done: bool
    model TodoInput:
      field title: str
  config:
    pool_size = 8

module Web:
  owns = ["http surface"]
  requires = [TodoStore]
  acceptance:
    test "serves the todo list"
  artifacts = ["src/web/*.rs"]

policy Quality:
  rule "every endpoint has a test" severity=high
  rule "no unwrap in handlers" severity=medium

pipeline "delivery":
  step design:
    modules = [Persistence, Web]
    output = design
  step implement:
    modules = [Persistence, Web]
    output = code
    require = "design sign-off"
    gate = "review"
"#;
    let result = compile(source, "todo.bp");
    assert!(result.success, "diagnostics: {:?}", result.diagnostics);
    assert!(result.diagnostics.is_empty());

    let program = result.program.expect("program");
    assert_eq!(program.systems.len(), 1);
    let system = &program.systems[0];
    // Inherited from the template, with the child's override applied.
    let web = system.stack.iter().find(|e| e.key == "web").expect("web");
    assert_eq!(
        web.value,
        blueprint_dsl::StackValue::Scalar("actix".to_string())
    );
    assert_eq!(program.interfaces.len(), 1);
    assert_eq!(program.interfaces[0].methods.len(), 3);
}

// Spec scenario: a module implementing an interface with no contract block
// reports exactly one missing method.
#[test]
fn missing_method_is_one_diagnostic() {
    let source = "interface X:\n  method f(a: str) -> int\nmodule M:\n  implements = [X]\n";
    let result = compile(source, "<input>");
    assert!(!result.success);
    assert_eq!(result.diagnostics.len(), 1, "{:?}", result.diagnostics);
    assert_eq!(
        result.diagnostics[0].message,
        "module 'M' missing method 'f' required by 'X'"
    );
    // Partial structure is still available.
    assert!(result.program.is_some());
}

// Spec scenario: mutual requires with no interfaces yields one cycle
// diagnostic naming both modules.
#[test]
fn two_module_cycle_is_one_diagnostic() {
    let source = "module A:\n  requires = [B]\nmodule B:\n  requires = [A]\n";
    let result = compile(source, "<input>");
    assert!(!result.success);
    assert_eq!(result.diagnostics.len(), 1, "{:?}", result.diagnostics);
    let message = &result.diagnostics[0].message;
    assert!(message.contains("circular module dependency"));
    assert!(message.contains("A"));
    assert!(message.contains("B"));
}

#[test]
fn cycle_detection_is_order_independent() {
    let forward = "module A:\n  requires = [B]\nmodule B:\n  requires = [C]\nmodule C:\n  requires = [A]\n";
    let shuffled = "module C:\n  requires = [A]\nmodule B:\n  requires = [C]\nmodule A:\n  requires = [B]\n";

    for source in [forward, shuffled] {
        let result = compile(source, "<input>");
        let cycle_errors: Vec<_> = errors(&result)
            .into_iter()
            .filter(|m| m.contains("circular module dependency"))
            .collect();
        assert_eq!(cycle_errors.len(), 1, "{:?}", result.diagnostics);
        for name in ["A", "B", "C"] {
            assert!(cycle_errors[0].contains(name), "{}", cycle_errors[0]);
        }
    }
}

// Spec scenario: severity membership is a semantic concern, invisible to
// the syntax-only entry point.
#[test]
fn invalid_severity_is_semantic_not_syntactic() {
    let source = "policy P:\n  rule \"x\" severity=urgent\n";

    let result = compile(source, "<input>");
    assert!(!result.success);
    assert_eq!(result.diagnostics.len(), 1, "{:?}", result.diagnostics);
    assert!(result.diagnostics[0]
        .message
        .contains("invalid severity 'urgent'"));

    let check = validate_syntax(source);
    assert!(check.valid);
    assert!(check.diagnostics.is_empty());
}

// Spec scenario: duplicate system names produce one diagnostic, and both
// declarations remain inspectable in the resolved program.
#[test]
fn duplicate_system_names() {
    let source = "system \"App\":\n  version = \"1\"\nsystem \"App\":\n  version = \"2\"\n";
    let result = compile(source, "<input>");
    assert!(!result.success);
    assert_eq!(result.diagnostics.len(), 1, "{:?}", result.diagnostics);
    assert_eq!(result.diagnostics[0].message, "duplicate name 'App'");

    let program = result.program.expect("program");
    assert_eq!(program.systems.len(), 2);
    assert_eq!(program.systems[0].version.as_deref(), Some("1"));
    assert_eq!(program.systems[1].version.as_deref(), Some("2"));
}

// Spec property: adding one method to an implemented interface adds
// exactly one diagnostic; removing it restores the prior set.
#[test]
fn completeness_is_monotonic() {
    let complete = r#"
interface X:
  method f(a: str) -> int
module M:
  implements = [X]
  contract:
    method f(a: str) -> int
"#;
    let extended = r#"
interface X:
  method f(a: str) -> int
  method g() -> bool
module M:
  implements = [X]
  contract:
    method f(a: str) -> int
"#;

    let before = compile(complete, "<input>");
    assert!(before.success, "{:?}", before.diagnostics);

    let during = compile(extended, "<input>");
    assert_eq!(during.diagnostics.len(), 1, "{:?}", during.diagnostics);
    assert!(during.diagnostics[0]
        .message
        .contains("missing method 'g' required by 'X'"));

    let after = compile(complete, "<input>");
    assert_eq!(after.diagnostics, before.diagnostics);
}

#[test]
fn validate_syntax_reports_line_count() {
    let check = validate_syntax("module M:\n  owns = [\"a\"]\n");
    assert!(check.valid);
    assert_eq!(check.line_count, 3);
}

#[test]
fn validate_syntax_flags_syntax_errors() {
    let check = validate_syntax("module M:\n  owns = = [\"a\"]\n");
    assert!(!check.valid);
    assert!(!check.diagnostics.is_empty());
}

#[test]
fn summary_reflects_per_system_structure() {
    let source = r#"
system "Shop":
  interface Catalog:
    method list() -> List[Item]
  module CatalogService:
    implements = [Catalog]
    contract:
      method list() -> List[Item]
  policy Rules:
    rule "audit writes" severity=low
system "Other":
  module Lone:
    owns = ["misc"]
"#;
    let result = compile(source, "<input>");
    assert!(result.success, "{:?}", result.diagnostics);
    let summary = structure_summary(&result.program.expect("program"));
    assert_eq!(summary.system_count, 2);
    assert_eq!(summary.module_count, 2);
    assert_eq!(summary.per_system[0].name, "Shop");
    assert_eq!(summary.per_system[0].interface_count, 1);
    assert_eq!(summary.per_system[0].policy_count, 1);
    assert_eq!(summary.per_system[1].module_count, 1);
}

#[test]
fn unknown_type_is_a_warning_not_an_error() {
    let source = "interface I:\n  method f() -> Mystery\n";
    let result = compile(source, "<input>");
    assert!(result.success, "{:?}", result.diagnostics);
    assert_eq!(result.diagnostics.len(), 1);
    assert_eq!(result.diagnostics[0].severity, DiagnosticSeverity::Warning);
    assert!(result.diagnostics[0].message.contains("unknown type 'Mystery'"));
}

#[test]
fn empty_input_compiles_to_empty_program() {
    let result = compile("", "<input>");
    assert!(result.success);
    let program = result.program.expect("program");
    assert!(program.document.statements.is_empty());
    assert!(program.systems.is_empty());
}
