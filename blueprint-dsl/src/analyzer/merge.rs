//! Inheritance merge
//!
//! Produces the resolved view of a system, template, or interface by
//! folding its `extends` chain in parent-then-child order. Scalar fields
//! follow "child wins when explicitly set"; list fields are the parent's
//! verbatim unless the child re-declares the same-named list or issues
//! explicit edits, which apply strictly in body order. Originals are never
//! mutated; re-running a merge over the same declarations yields the same
//! view.

use crate::errors::ErrorReporter;
use crate::parser::ast::*;
use serde::{Deserialize, Serialize};

/// Value of a resolved stack entry. Declared entries are scalar; an
/// `append` edit promotes the entry to a list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StackValue {
    Scalar(String),
    List(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedStackEntry {
    pub key: String,
    pub value: StackValue,
}

/// The intent record after merging; empty lists mean "nothing declared
/// anywhere in the chain".
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResolvedIntent {
    pub primary: Option<String>,
    pub outcomes: Vec<String>,
    pub out_of_scope: Vec<String>,
}

/// Merged view of a system or template after inheritance resolution.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SystemView {
    pub version: Option<String>,
    pub stack: Vec<ResolvedStackEntry>,
    pub intent: ResolvedIntent,
    pub interfaces: Vec<InterfaceDecl>,
    pub modules: Vec<ModuleDecl>,
    pub policies: Vec<PolicyDecl>,
    pub pipelines: Vec<PipelineDecl>,
}

/// An interface with its full method set flattened through the `extends`
/// chain, `override method` entries applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedInterface {
    pub name: String,
    /// Enclosing system name, or `None` for a top-level interface.
    pub scope: Option<String>,
    pub doc: Option<String>,
    pub methods: Vec<MethodSig>,
    pub invariants: Vec<String>,
}

/// Merge a system/template declaration over its (already resolved) parent.
pub fn merge_system(
    parent: Option<&SystemView>,
    decl: &SystemDecl,
    reporter: &mut ErrorReporter,
) -> SystemView {
    let mut view = parent.cloned().unwrap_or_default();

    if decl.version.is_some() {
        view.version = decl.version.clone();
    }

    for entry in &decl.stack {
        set_stack_scalar(&mut view.stack, &entry.key, entry.value.clone());
    }

    if let Some(intent) = &decl.intent {
        if intent.primary.is_some() {
            view.intent.primary = intent.primary.clone();
        }
        if let Some(outcomes) = &intent.outcomes {
            view.intent.outcomes = outcomes.clone();
        }
        if let Some(out_of_scope) = &intent.out_of_scope {
            view.intent.out_of_scope = out_of_scope.clone();
        }
    }

    merge_named(&mut view.interfaces, &decl.interfaces, |d| &d.name);
    merge_named(&mut view.modules, &decl.modules, |d| &d.name);
    merge_named(&mut view.policies, &decl.policies, |d| &d.name);
    merge_named(&mut view.pipelines, &decl.pipelines, |d| &d.name);

    for edit in &decl.edits {
        apply_edit(&mut view, edit, reporter);
    }

    view
}

/// Flatten an interface over its (already resolved) parent.
pub fn merge_interface(
    parent: Option<&ResolvedInterface>,
    decl: &InterfaceDecl,
    scope: Option<String>,
) -> ResolvedInterface {
    let mut methods: Vec<MethodSig> = parent.map(|p| p.methods.clone()).unwrap_or_default();
    for method in &decl.methods {
        if let Some(slot) = methods.iter_mut().find(|m| m.name == method.name) {
            *slot = method.clone();
        } else {
            methods.push(method.clone());
        }
    }

    let mut invariants: Vec<String> = parent.map(|p| p.invariants.clone()).unwrap_or_default();
    for invariant in &decl.invariants {
        if !invariants.contains(invariant) {
            invariants.push(invariant.clone());
        }
    }

    ResolvedInterface {
        name: decl.name.clone(),
        scope,
        doc: decl.doc.clone(),
        methods,
        invariants,
    }
}

/// Same-named child blocks replace the parent's in place; new ones append.
fn merge_named<T: Clone>(existing: &mut Vec<T>, incoming: &[T], name_of: fn(&T) -> &String) {
    for item in incoming {
        if let Some(slot) = existing.iter_mut().find(|e| name_of(e) == name_of(item)) {
            *slot = item.clone();
        } else {
            existing.push(item.clone());
        }
    }
}

enum EditTarget<'a> {
    StackKey(&'a str),
    IntentPrimary,
    IntentOutcomes,
    IntentOutOfScope,
    Unknown,
}

fn classify_path(path: &[String]) -> EditTarget<'_> {
    match path {
        [root, key] if root == "stack" => EditTarget::StackKey(key),
        [root, field] if root == "intent" => match field.as_str() {
            "primary" => EditTarget::IntentPrimary,
            "outcomes" => EditTarget::IntentOutcomes,
            "out_of_scope" => EditTarget::IntentOutOfScope,
            _ => EditTarget::Unknown,
        },
        _ => EditTarget::Unknown,
    }
}

fn apply_edit(view: &mut SystemView, edit: &EditOp, reporter: &mut ErrorReporter) {
    match edit {
        EditOp::Override { path, value, span } => match classify_path(path) {
            EditTarget::StackKey(key) => set_stack_scalar(&mut view.stack, key, value.clone()),
            EditTarget::IntentPrimary => view.intent.primary = Some(value.clone()),
            EditTarget::IntentOutcomes => view.intent.outcomes = vec![value.clone()],
            EditTarget::IntentOutOfScope => view.intent.out_of_scope = vec![value.clone()],
            EditTarget::Unknown => report_bad_path("override", path, *span, reporter),
        },
        EditOp::Append { path, value, span } => match classify_path(path) {
            EditTarget::StackKey(key) => append_stack(&mut view.stack, key, value.clone()),
            EditTarget::IntentOutcomes => view.intent.outcomes.push(value.clone()),
            EditTarget::IntentOutOfScope => view.intent.out_of_scope.push(value.clone()),
            EditTarget::IntentPrimary => reporter.error(
                "cannot append to scalar path 'intent.primary'",
                span.line,
                span.column,
            ),
            EditTarget::Unknown => report_bad_path("append", path, *span, reporter),
        },
        EditOp::Remove { path, value, span } => match classify_path(path) {
            EditTarget::StackKey(key) => remove_stack(&mut view.stack, key, value),
            EditTarget::IntentOutcomes => view.intent.outcomes.retain(|v| v != value),
            EditTarget::IntentOutOfScope => view.intent.out_of_scope.retain(|v| v != value),
            EditTarget::IntentPrimary => reporter.error(
                "cannot remove from scalar path 'intent.primary'",
                span.line,
                span.column,
            ),
            EditTarget::Unknown => report_bad_path("remove", path, *span, reporter),
        },
        EditOp::Replace { name, block, span } => {
            apply_replace(view, name, block, *span, reporter);
        }
    }
}

fn apply_replace(
    view: &mut SystemView,
    name: &str,
    block: &Statement,
    span: crate::lexer::Span,
    reporter: &mut ErrorReporter,
) {
    let replaced = match block {
        Statement::Interface(decl) => replace_named(&mut view.interfaces, name, decl, |d| &d.name),
        Statement::Module(decl) => replace_named(&mut view.modules, name, decl, |d| &d.name),
        Statement::Policy(decl) => replace_named(&mut view.policies, name, decl, |d| &d.name),
        Statement::Pipeline(decl) => replace_named(&mut view.pipelines, name, decl, |d| &d.name),
        Statement::System(_) | Statement::Template(_) => {
            reporter.error(
                format!("replace block '{}' cannot substitute a system or template", name),
                span.line,
                span.column,
            );
            return;
        }
    };
    if !replaced {
        reporter.error(
            format!("replace block target '{}' does not exist in the parent", name),
            span.line,
            span.column,
        );
    }
}

/// Replace the named entry; on a miss the block is appended so the child's
/// content is still part of the resolved view. Returns whether a match
/// existed.
fn replace_named<T: Clone>(
    existing: &mut Vec<T>,
    name: &str,
    decl: &T,
    name_of: fn(&T) -> &String,
) -> bool {
    if let Some(slot) = existing.iter_mut().find(|e| name_of(e) == name) {
        *slot = decl.clone();
        true
    } else {
        existing.push(decl.clone());
        false
    }
}

fn report_bad_path(op: &str, path: &[String], span: crate::lexer::Span, reporter: &mut ErrorReporter) {
    reporter.error(
        format!("unsupported {} path '{}'", op, path.join(".")),
        span.line,
        span.column,
    );
}

fn set_stack_scalar(stack: &mut Vec<ResolvedStackEntry>, key: &str, value: String) {
    if let Some(entry) = stack.iter_mut().find(|e| e.key == key) {
        entry.value = StackValue::Scalar(value);
    } else {
        stack.push(ResolvedStackEntry {
            key: key.to_string(),
            value: StackValue::Scalar(value),
        });
    }
}

fn append_stack(stack: &mut Vec<ResolvedStackEntry>, key: &str, value: String) {
    if let Some(entry) = stack.iter_mut().find(|e| e.key == key) {
        match &mut entry.value {
            StackValue::Scalar(existing) => {
                entry.value = StackValue::List(vec![existing.clone(), value]);
            }
            StackValue::List(items) => items.push(value),
        }
    } else {
        stack.push(ResolvedStackEntry {
            key: key.to_string(),
            value: StackValue::List(vec![value]),
        });
    }
}

fn remove_stack(stack: &mut Vec<ResolvedStackEntry>, key: &str, value: &str) {
    if let Some(pos) = stack.iter().position(|e| e.key == key) {
        let drop_entry = match &mut stack[pos].value {
            StackValue::Scalar(existing) => existing == value,
            StackValue::List(items) => {
                items.retain(|v| v != value);
                false
            }
        };
        if drop_entry {
            stack.remove(pos);
        }
    }
}
