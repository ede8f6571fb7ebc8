//! Module dependency graph validation
//!
//! Builds a directed graph over module names from `requires` edges and
//! reports every cycle exactly once, naming the participating modules in
//! traversal order. Detection is depth-first search with a recursion
//! stack; independent cycles elsewhere in the graph are still found after
//! one is reported.

use crate::errors::ErrorReporter;
use crate::lexer::Span;

pub(crate) struct DepNode {
    pub name: String,
    pub span: Span,
    pub deps: Vec<usize>,
}

#[derive(Clone, Copy, PartialEq)]
enum Color {
    White,
    Grey,
    Black,
}

pub(crate) fn report_cycles(nodes: &[DepNode], reporter: &mut ErrorReporter) {
    let mut color = vec![Color::White; nodes.len()];
    let mut stack = Vec::new();

    for index in 0..nodes.len() {
        if color[index] == Color::White {
            visit(index, nodes, &mut color, &mut stack, reporter);
        }
    }
}

fn visit(
    index: usize,
    nodes: &[DepNode],
    color: &mut [Color],
    stack: &mut Vec<usize>,
    reporter: &mut ErrorReporter,
) {
    color[index] = Color::Grey;
    stack.push(index);

    for &dep in &nodes[index].deps {
        match color[dep] {
            Color::White => visit(dep, nodes, color, stack, reporter),
            Color::Grey => {
                // Back edge: the cycle is the stack suffix from the first
                // occurrence of `dep`, closed by `dep` itself.
                let start = stack.iter().position(|&n| n == dep).unwrap_or(0);
                let mut names: Vec<&str> =
                    stack[start..].iter().map(|&n| nodes[n].name.as_str()).collect();
                names.push(nodes[dep].name.as_str());
                let head = &nodes[dep];
                reporter.error(
                    format!("circular module dependency: {}", names.join(" -> ")),
                    head.span.line,
                    head.span.column,
                );
            }
            Color::Black => {}
        }
    }

    stack.pop();
    color[index] = Color::Black;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(name: &str, deps: Vec<usize>) -> DepNode {
        DepNode {
            name: name.to_string(),
            span: Span::default(),
            deps,
        }
    }

    fn cycle_messages(nodes: &[DepNode]) -> Vec<String> {
        let mut reporter = ErrorReporter::new();
        report_cycles(nodes, &mut reporter);
        reporter
            .into_diagnostics()
            .into_iter()
            .map(|d| d.message)
            .collect()
    }

    #[test]
    fn no_cycle_no_diagnostics() {
        let nodes = vec![node("A", vec![1]), node("B", vec![2]), node("C", vec![])];
        assert!(cycle_messages(&nodes).is_empty());
    }

    #[test]
    fn two_module_cycle_reported_once() {
        let nodes = vec![node("A", vec![1]), node("B", vec![0])];
        let messages = cycle_messages(&nodes);
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("A"));
        assert!(messages[0].contains("B"));
    }

    #[test]
    fn three_module_cycle_names_all_members() {
        let nodes = vec![node("A", vec![1]), node("B", vec![2]), node("C", vec![0])];
        let messages = cycle_messages(&nodes);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0], "circular module dependency: A -> B -> C -> A");
    }

    #[test]
    fn independent_cycles_each_reported() {
        let nodes = vec![
            node("A", vec![1]),
            node("B", vec![0]),
            node("C", vec![3]),
            node("D", vec![2]),
        ];
        let messages = cycle_messages(&nodes);
        assert_eq!(messages.len(), 2);
    }

    #[test]
    fn self_requirement_is_a_cycle() {
        let nodes = vec![node("A", vec![0])];
        let messages = cycle_messages(&nodes);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0], "circular module dependency: A -> A");
    }
}
