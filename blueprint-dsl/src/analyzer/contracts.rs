//! Interface-implementation completeness
//!
//! A module that lists an interface in `implements` must declare a
//! contract method for every signature the interface carries after its own
//! `extends` chain is flattened. Each missing or mismatched method is its
//! own diagnostic, so a caller sees the full gap in one run.

use super::merge::ResolvedInterface;
use crate::errors::ErrorReporter;
use crate::parser::ast::ModuleDecl;

/// Check one module against one implemented interface.
///
/// Matching is by method name, arity, and structural type shape; parameter
/// names are not compared. When the module also `exports` the interface,
/// parameter types must match structurally as well.
pub(crate) fn check_module_contract(
    module: &ModuleDecl,
    iface: &ResolvedInterface,
    exported: bool,
    reporter: &mut ErrorReporter,
) {
    for required in &iface.methods {
        let found = module.contract.iter().find(|m| m.name == required.name);
        let Some(found) = found else {
            reporter.error(
                format!(
                    "module '{}' missing method '{}' required by '{}'",
                    module.name, required.name, iface.name
                ),
                module.span.line,
                module.span.column,
            );
            continue;
        };

        let mut compatible = found.params.len() == required.params.len()
            && found.return_type == required.return_type;
        if compatible && exported {
            compatible = found
                .params
                .iter()
                .zip(&required.params)
                .all(|(have, want)| have.ty == want.ty);
        }

        if !compatible {
            reporter.error(
                format!(
                    "module '{}' method '{}' does not match the signature required by '{}'",
                    module.name, required.name, iface.name
                ),
                found.span.line,
                found.span.column,
            );
        }
    }
}
