//! Pretty-printer
//!
//! Renders an AST back to canonical Blueprint source with 2-space
//! indentation. Round-trip tests rely on `parse(pretty_print(ast))`
//! reproducing the AST.

use crate::parser::ast::*;
use crate::parser::parser::escape_string;

/// Pretty-print a document back to DSL source code.
pub fn pretty_print(document: &Document) -> String {
    let mut out = String::new();
    for (i, statement) in document.statements.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        print_statement(&mut out, statement, 0);
    }
    out
}

fn print_statement(out: &mut String, statement: &Statement, depth: usize) {
    match statement {
        Statement::Template(decl) => print_system(out, decl, depth, "template"),
        Statement::System(decl) => print_system(out, decl, depth, "system"),
        Statement::Interface(decl) => print_interface(out, decl, depth),
        Statement::Module(decl) => print_module(out, decl, depth),
        Statement::Policy(decl) => print_policy(out, decl, depth),
        Statement::Pipeline(decl) => print_pipeline(out, decl, depth),
    }
}

fn print_system(out: &mut String, decl: &SystemDecl, depth: usize, keyword: &str) {
    indent(out, depth);
    out.push_str(keyword);
    out.push(' ');
    out.push_str(&quoted(&decl.name));
    if let Some(extends) = &decl.extends {
        out.push_str(" extends ");
        out.push_str(&quoted(extends));
    }
    out.push_str(":\n");

    let body = depth + 1;
    if let Some(version) = &decl.version {
        indent(out, body);
        out.push_str(&format!("version = {}\n", quoted(version)));
    }
    if !decl.stack.is_empty() {
        indent(out, body);
        out.push_str("stack:\n");
        for entry in &decl.stack {
            indent(out, body + 1);
            out.push_str(&format!("{} = {}\n", entry.key, quoted(&entry.value)));
        }
    }
    if let Some(intent) = &decl.intent {
        indent(out, body);
        out.push_str("intent:\n");
        if let Some(primary) = &intent.primary {
            indent(out, body + 1);
            out.push_str(&format!("primary = {}\n", quoted(primary)));
        }
        if let Some(outcomes) = &intent.outcomes {
            indent(out, body + 1);
            out.push_str(&format!("outcomes = {}\n", string_list(outcomes)));
        }
        if let Some(out_of_scope) = &intent.out_of_scope {
            indent(out, body + 1);
            out.push_str(&format!("out_of_scope = {}\n", string_list(out_of_scope)));
        }
    }
    for iface in &decl.interfaces {
        print_interface(out, iface, body);
    }
    for module in &decl.modules {
        print_module(out, module, body);
    }
    for policy in &decl.policies {
        print_policy(out, policy, body);
    }
    for pipeline in &decl.pipelines {
        print_pipeline(out, pipeline, body);
    }
    for edit in &decl.edits {
        print_edit(out, edit, body);
    }
}

fn print_edit(out: &mut String, edit: &EditOp, depth: usize) {
    match edit {
        EditOp::Override { path, value, .. } => {
            indent(out, depth);
            out.push_str(&format!("override {} = {}\n", path.join("."), quoted(value)));
        }
        EditOp::Append { path, value, .. } => {
            indent(out, depth);
            out.push_str(&format!("append {} += {}\n", path.join("."), quoted(value)));
        }
        EditOp::Remove { path, value, .. } => {
            indent(out, depth);
            out.push_str(&format!("remove {} -= {}\n", path.join("."), quoted(value)));
        }
        EditOp::Replace { name, block, .. } => {
            indent(out, depth);
            out.push_str(&format!("replace block {}:\n", name));
            print_statement(out, block, depth + 1);
        }
    }
}

fn print_interface(out: &mut String, decl: &InterfaceDecl, depth: usize) {
    indent(out, depth);
    out.push_str(&format!("interface {}", decl.name));
    if let Some(extends) = &decl.extends {
        out.push_str(&format!(" extends {}", extends));
    }
    out.push_str(":\n");

    let body = depth + 1;
    if let Some(doc) = &decl.doc {
        indent(out, body);
        out.push_str(&format!("doc = {}\n", quoted(doc)));
    }
    for method in &decl.methods {
        indent(out, body);
        if method.is_override {
            out.push_str("override ");
        }
        out.push_str(&method_line(method));
        out.push('\n');
    }
    print_invariants(out, &decl.invariants, body);
}

fn print_module(out: &mut String, decl: &ModuleDecl, depth: usize) {
    indent(out, depth);
    out.push_str(&format!("module {}:\n", decl.name));

    let body = depth + 1;
    if let Some(doc) = &decl.doc {
        indent(out, body);
        out.push_str(&format!("doc = {}\n", quoted(doc)));
    }
    if !decl.owns.is_empty() {
        indent(out, body);
        out.push_str(&format!("owns = {}\n", string_list(&decl.owns)));
    }
    if !decl.requires.is_empty() {
        indent(out, body);
        out.push_str(&format!("requires = {}\n", name_list(&decl.requires)));
    }
    if !decl.implements.is_empty() {
        indent(out, body);
        out.push_str(&format!("implements = {}\n", name_list(&decl.implements)));
    }
    if !decl.exports.is_empty() {
        indent(out, body);
        out.push_str(&format!("exports = {}\n", name_list(&decl.exports)));
    }
    if let Some(api) = &decl.api {
        indent(out, body);
        out.push_str("api:\n");
        for entry in &api.entries {
            print_api_entry(out, entry, body + 1);
        }
    }
    if !decl.contract.is_empty() {
        indent(out, body);
        out.push_str("contract:\n");
        for method in &decl.contract {
            indent(out, body + 1);
            out.push_str(&method_line(method));
            out.push('\n');
        }
    }
    print_invariants(out, &decl.invariants, body);
    if !decl.acceptance.is_empty() {
        indent(out, body);
        out.push_str("acceptance:\n");
        for test in &decl.acceptance {
            indent(out, body + 1);
            out.push_str(&format!("test {}\n", quoted(test)));
        }
    }
    if !decl.artifacts.is_empty() {
        indent(out, body);
        out.push_str(&format!("artifacts = {}\n", string_list(&decl.artifacts)));
    }
    if !decl.config.is_empty() {
        indent(out, body);
        out.push_str("config:\n");
        for entry in &decl.config {
            indent(out, body + 1);
            out.push_str(&format!("{} = {}\n", entry.key, config_value(&entry.value)));
        }
    }
}

fn print_api_entry(out: &mut String, entry: &ApiEntry, depth: usize) {
    match entry {
        ApiEntry::Endpoint(endpoint) => {
            indent(out, depth);
            out.push_str(&format!(
                "endpoint {} -> {}",
                quoted(&format!("{} {}", endpoint.method, endpoint.path)),
                endpoint.returns
            ));
            if let Some(status) = endpoint.status {
                out.push_str(&format!(" {}", status));
            }
            out.push('\n');
        }
        ApiEntry::Websocket(ws) => {
            indent(out, depth);
            out.push_str(&format!("websocket {} -> {}\n", quoted(&ws.path), ws.returns));
        }
        ApiEntry::Command(command) => {
            indent(out, depth);
            out.push_str(&format!(
                "command {} -> {}\n",
                quoted(&command.name),
                command.returns
            ));
        }
        ApiEntry::Model(model) => {
            indent(out, depth);
            out.push_str(&format!("model {}:\n", model.name));
            for field in &model.fields {
                indent(out, depth + 1);
                out.push_str(&format!("field {}: {}\n", field.name, field.ty));
            }
        }
    }
}

fn print_policy(out: &mut String, decl: &PolicyDecl, depth: usize) {
    indent(out, depth);
    out.push_str(&format!("policy {}:\n", decl.name));
    for rule in &decl.rules {
        indent(out, depth + 1);
        out.push_str(&format!(
            "rule {} severity={}\n",
            quoted(&rule.text),
            rule.severity
        ));
    }
}

fn print_pipeline(out: &mut String, decl: &PipelineDecl, depth: usize) {
    indent(out, depth);
    out.push_str(&format!("pipeline {}:\n", quoted(&decl.name)));
    for step in &decl.steps {
        indent(out, depth + 1);
        out.push_str(&format!("step {}:\n", step.name));
        let body = depth + 2;
        if !step.modules.is_empty() {
            indent(out, body);
            out.push_str(&format!("modules = {}\n", name_list(&step.modules)));
        }
        if let Some(output) = &step.output {
            indent(out, body);
            out.push_str(&format!("output = {}\n", output.name));
        }
        if let Some(require) = &step.require {
            indent(out, body);
            out.push_str(&format!("require = {}\n", quoted(require)));
        }
        if let Some(gate) = &step.gate {
            indent(out, body);
            out.push_str(&format!("gate = {}\n", quoted(gate)));
        }
    }
}

fn print_invariants(out: &mut String, invariants: &[String], depth: usize) {
    if invariants.is_empty() {
        return;
    }
    indent(out, depth);
    out.push_str("invariants:\n");
    for invariant in invariants {
        indent(out, depth + 1);
        out.push_str(&format!("invariant {}\n", quoted(invariant)));
    }
}

fn method_line(method: &MethodSig) -> String {
    let params = method
        .params
        .iter()
        .map(|p| format!("{}: {}", p.name, p.ty))
        .collect::<Vec<_>>()
        .join(", ");
    format!("method {}({}) -> {}", method.name, params, method.return_type)
}

fn string_list(items: &[String]) -> String {
    let joined = items
        .iter()
        .map(|s| quoted(s))
        .collect::<Vec<_>>()
        .join(", ");
    format!("[{}]", joined)
}

fn name_list(items: &[NameRef]) -> String {
    let joined = items
        .iter()
        .map(|r| r.name.clone())
        .collect::<Vec<_>>()
        .join(", ");
    format!("[{}]", joined)
}

fn config_value(value: &ConfigValue) -> String {
    match value {
        ConfigValue::Str(s) => quoted(s),
        ConfigValue::Number(n) => format!("{}", n),
        ConfigValue::Bool(b) => format!("{}", b),
    }
}

fn quoted(s: &str) -> String {
    format!("\"{}\"", escape_string(s))
}

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str("  ");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    #[test]
    fn full_document_round_trip() {
        let source = r#"template "Base":
  stack:
    language = "Python"

system "App" extends "Base":
  version = "2.0"
  intent:
    primary = "serve todos"
    outcomes = ["fast", "correct"]
  override stack.language = "Rust"
  append stack.tools += "cargo"

interface Store:
  doc = "persistence"
  method save(item: Todo) -> UUID
  invariants:
    invariant "durable writes"

module StoreImpl:
  implements = [Store]
  contract:
    method save(item: Todo) -> UUID
  api:
    endpoint "POST /items" -> UUID 201
    model Todo:
      field id: UUID
      field title: str
  config:
    pool_size = 8

policy Safety:
  rule "no panics" severity=high

pipeline "build":
  step all:
    modules = [StoreImpl]
    output = code
"#;
        let (document, diagnostics) = parse(source);
        assert!(diagnostics.is_empty(), "{:?}", diagnostics);

        let printed = pretty_print(&document);
        let (reparsed, rediagnostics) = parse(&printed);
        assert!(rediagnostics.is_empty(), "{:?}\n{}", rediagnostics, printed);
        assert_eq!(
            crate::compiler::structure_summary(&crate::analyzer::analyze(
                &document,
                &mut crate::errors::ErrorReporter::new()
            )),
            crate::compiler::structure_summary(&crate::analyzer::analyze(
                &reparsed,
                &mut crate::errors::ErrorReporter::new()
            ))
        );
    }

    #[test]
    fn printed_source_is_stable() {
        let source = "system \"A\":\n  version = \"1\"\n";
        let (document, _) = parse(source);
        let once = pretty_print(&document);
        let (reparsed, _) = parse(&once);
        assert_eq!(pretty_print(&reparsed), once);
    }
}
