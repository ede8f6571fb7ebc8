//! Parser module

pub mod ast;
#[allow(clippy::module_inception)]
pub mod parser;
pub mod walk;

pub use ast::*;
pub use parser::{parse, Parser};
pub use walk::{walk_document, Visitor};
