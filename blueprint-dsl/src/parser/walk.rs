//! AST traversal
//!
//! A visitor with one hook per node kind, plus `walk_*` helpers that drive
//! recursion. Hooks default to doing nothing; `walk_*` always descends, so
//! a visitor sees every node regardless of which hooks it implements.
//! Parent context is passed explicitly where a check needs it — nodes hold
//! no parent back-references.

use super::ast::*;

pub trait Visitor {
    fn visit_template(&mut self, _decl: &SystemDecl) {}
    fn visit_system(&mut self, _decl: &SystemDecl) {}
    fn visit_interface(&mut self, _decl: &InterfaceDecl) {}
    fn visit_module(&mut self, _decl: &ModuleDecl) {}
    fn visit_policy(&mut self, _decl: &PolicyDecl) {}
    fn visit_pipeline(&mut self, _decl: &PipelineDecl) {}
    fn visit_model(&mut self, _decl: &ModelDecl) {}
    fn visit_method(&mut self, _sig: &MethodSig) {}
}

pub fn walk_document<V: Visitor>(visitor: &mut V, document: &Document) {
    for statement in &document.statements {
        walk_statement(visitor, statement);
    }
}

pub fn walk_statement<V: Visitor>(visitor: &mut V, statement: &Statement) {
    match statement {
        Statement::Template(decl) => {
            visitor.visit_template(decl);
            walk_system(visitor, decl);
        }
        Statement::System(decl) => {
            visitor.visit_system(decl);
            walk_system(visitor, decl);
        }
        Statement::Interface(decl) => {
            visitor.visit_interface(decl);
            walk_interface(visitor, decl);
        }
        Statement::Module(decl) => {
            visitor.visit_module(decl);
            walk_module(visitor, decl);
        }
        Statement::Policy(decl) => {
            visitor.visit_policy(decl);
        }
        Statement::Pipeline(decl) => {
            visitor.visit_pipeline(decl);
        }
    }
}

pub fn walk_system<V: Visitor>(visitor: &mut V, decl: &SystemDecl) {
    for iface in &decl.interfaces {
        visitor.visit_interface(iface);
        walk_interface(visitor, iface);
    }
    for module in &decl.modules {
        visitor.visit_module(module);
        walk_module(visitor, module);
    }
    for policy in &decl.policies {
        visitor.visit_policy(policy);
    }
    for pipeline in &decl.pipelines {
        visitor.visit_pipeline(pipeline);
    }
    for edit in &decl.edits {
        if let EditOp::Replace { block, .. } = edit {
            walk_statement(visitor, block);
        }
    }
}

pub fn walk_interface<V: Visitor>(visitor: &mut V, decl: &InterfaceDecl) {
    for method in &decl.methods {
        visitor.visit_method(method);
    }
}

pub fn walk_module<V: Visitor>(visitor: &mut V, decl: &ModuleDecl) {
    for method in &decl.contract {
        visitor.visit_method(method);
    }
    if let Some(api) = &decl.api {
        for entry in &api.entries {
            if let ApiEntry::Model(model) = entry {
                visitor.visit_model(model);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    #[derive(Default)]
    struct Counter {
        interfaces: usize,
        modules: usize,
        models: usize,
        methods: usize,
    }

    impl Visitor for Counter {
        fn visit_interface(&mut self, _decl: &InterfaceDecl) {
            self.interfaces += 1;
        }
        fn visit_module(&mut self, _decl: &ModuleDecl) {
            self.modules += 1;
        }
        fn visit_model(&mut self, _decl: &ModelDecl) {
            self.models += 1;
        }
        fn visit_method(&mut self, _sig: &MethodSig) {
            self.methods += 1;
        }
    }

    #[test]
    fn walk_reaches_nested_nodes() {
        let source = r#"
system "App":
  interface I:
    method f() -> int
  module M:
    contract:
      method f() -> int
    api:
      model Row:
        field id: int
interface Top:
  method g() -> str
"#;
        let (document, diagnostics) = parse(source);
        assert!(diagnostics.is_empty(), "{:?}", diagnostics);

        let mut counter = Counter::default();
        walk_document(&mut counter, &document);
        assert_eq!(counter.interfaces, 2);
        assert_eq!(counter.modules, 1);
        assert_eq!(counter.models, 1);
        assert_eq!(counter.methods, 3);
    }
}
