use itertools::Itertools;
use utils::DiagnosticEmitter;

use crate::{
    ast::{Ast, NodeId},
    cursor::Config,
    program::Program,
    session::{FlowOptions, FlowSession},
};

pub fn parse_string(source: &str) -> Result<Program, String> {
    parse_modules(&[("main.js", source)])
}

pub fn parse_modules(sources: &[(&str, &str)]) -> Result<Program, String> {
    let mut diag = DiagnosticEmitter::log_to_buffer();
    let program = Program::build(sources, &mut diag);
    program.ok_or_else(|| diag.err_buffer().unwrap_or_default())
}

/// The errors reported while parsing `source`.
pub fn parse_errors(source: &str) -> String {
    let mut diag = DiagnosticEmitter::log_to_buffer();
    let program = Program::parse(source, &mut diag);
    assert!(program.is_none(), "expected a parse error for: {source}");
    diag.err_buffer().unwrap_or_default()
}

fn tree_depth(ast: &Ast, node: NodeId) -> usize {
    let mut depth = 0;
    let mut current = node;
    while let Some(parent) = ast.parent(current) {
        depth += 1;
        current = parent;
    }
    depth
}

/// The `nth` innermost node spelled exactly `text` in module `path`, in
/// source order.
pub fn node_in(program: &Program, path: &str, text: &str, nth: usize) -> NodeId {
    let ast = program.ast();
    let module = program
        .module_by_path(path)
        .unwrap_or_else(|| panic!("no module {path}"));
    let candidates = ast
        .node_ids()
        .filter(|&node| ast.module_of(node) == module && ast.text(node) == text)
        .into_group_map_by(|&node| ast.node(node).start);
    let mut innermost: Vec<(u32, NodeId)> = candidates
        .into_iter()
        .filter_map(|(start, nodes)| {
            let node = nodes.into_iter().max_by_key(|&node| tree_depth(ast, node))?;
            Some((start, node))
        })
        .collect();
    innermost.sort();
    innermost
        .get(nth)
        .map(|&(_, node)| node)
        .unwrap_or_else(|| panic!("no occurrence {nth} of `{text}` in {path}"))
}

pub fn node(program: &Program, text: &str, nth: usize) -> NodeId {
    node_in(program, "main.js", text, nth)
}

/// Evaluates the `nth` occurrence of `text` under unconstrained contexts
/// and returns the sorted labels of its values.
pub fn values_of(session: &mut FlowSession<'_>, text: &str, nth: usize) -> Vec<String> {
    let node = node(session.program(), text, nth);
    let config = session.top_level(node);
    labels(session, config)
}

pub fn labels(session: &mut FlowSession<'_>, config: Config) -> Vec<String> {
    let values = session.evaluate(config).expect("analysis failed");
    session.label_set(&values)
}

pub fn session(program: &Program, m: usize) -> FlowSession<'_> {
    FlowSession::new(
        program,
        FlowOptions {
            m,
            ..FlowOptions::default()
        },
    )
}

pub fn strings(labels: &[&str]) -> Vec<String> {
    labels.iter().map(|label| (*label).to_owned()).collect()
}

/// The function node called or stored as `name`.
pub fn function_named(program: &Program, name: &str) -> NodeId {
    let ast = program.ast();
    ast.node_ids()
        .find(|&node| ast.is_function(node) && ast.function_name(node) == Some(name))
        .unwrap_or_else(|| panic!("no function {name}"))
}
