use clap::Parser as CommandLineParser;
use flow_lib::{
    ast::{Ast, NodeId, NodeKind},
    program::Program,
    session::{FlowOptions, FlowSession},
};
use itertools::Itertools;
use tracing::debug;
use utils::DiagnosticEmitter;

#[derive(Debug, CommandLineParser)]
#[command(
    name = "flow",
    version,
    about = "Demand-driven value-flow analysis of JavaScript modules."
)]
pub struct Opt {
    /// Length of the call strings kept in contexts.
    #[arg(long, default_value_t = 1)]
    pub m: usize,

    /// Evaluate the arguments of every call whose callee ends with NAME.
    #[arg(long, value_name = "NAME")]
    pub call: Option<String>,

    /// Only evaluate the argument at this position.
    #[arg(long, value_name = "INDEX", requires = "call")]
    pub arg: Option<usize>,

    /// Only evaluate the expressions on this line.
    #[arg(long, value_name = "LINE")]
    pub line: Option<u32>,

    /// Analyze the named function as an entry point with unknown arguments.
    #[arg(long, value_name = "FUNCTION")]
    pub entry: Vec<String>,

    /// Print the statistics of the solver.
    #[arg(long)]
    pub stats: bool,

    /// Modules of the program.
    #[arg(required = true)]
    pub files: Vec<String>,
}

impl Default for Opt {
    fn default() -> Self {
        Self {
            m: 1,
            call: None,
            arg: None,
            line: None,
            entry: Vec::new(),
            stats: false,
            files: Vec::new(),
        }
    }
}

/// The expressions to evaluate, in source order.
fn points_of_interest(ast: &Ast, opts: &Opt) -> Vec<NodeId> {
    let mut points = Vec::new();
    for node in ast.node_ids() {
        match (&opts.call, ast.kind(node)) {
            (Some(name), _) => {
                let Some((callee, arguments)) = ast.call_parts(node) else {
                    continue;
                };
                if !ast.text(callee).ends_with(name.as_str()) {
                    continue;
                }
                points.extend(
                    arguments
                        .iter()
                        .enumerate()
                        .filter(|(idx, _)| opts.arg.is_none_or(|arg| arg == *idx))
                        .map(|(_, &argument)| argument),
                );
            }
            (None, NodeKind::ExprStmt { expr }) => points.push(*expr),
            (None, NodeKind::Declarator { init: Some(init), .. }) => points.push(*init),
            _ => {}
        }
    }
    if let Some(line) = opts.line {
        points.retain(|&node| ast.line(node) == line);
    }
    points
        .into_iter()
        .sorted_by_key(|&node| (ast.module_of(node), ast.node(node).start))
        .dedup()
        .collect()
}

fn entry_functions(ast: &Ast, names: &[String], diag: &mut DiagnosticEmitter) -> Option<Vec<NodeId>> {
    let mut targets = Vec::new();
    for name in names {
        let found: Vec<NodeId> = ast
            .node_ids()
            .filter(|&node| ast.is_function(node) && ast.function_name(node) == Some(name.as_str()))
            .collect();
        if found.is_empty() {
            diag.err_ln(&format!("No function named '{name}'."));
            return None;
        }
        targets.extend(found);
    }
    Some(targets)
}

/// Analyzes the `(path, source)` modules and prints the values of the
/// selected expressions.
pub fn process_sources(
    sources: &[(&str, &str)],
    diag: &mut DiagnosticEmitter,
    opts: &Opt,
) -> Option<()> {
    let program = Program::build(sources, diag)?;
    let ast = program.ast();
    let targets = entry_functions(ast, &opts.entry, diag)?;
    let mut session = FlowSession::new(&program, FlowOptions { m: opts.m, targets });

    let points = points_of_interest(ast, opts);
    debug!(points = points.len(), m = opts.m, "evaluating points of interest");
    let show_path = ast.modules().len() > 1;
    let mut failed = false;
    for node in points {
        let config = session.top_level(node);
        match session.evaluate(config) {
            Ok(values) => {
                let labels = session.label_set(&values).join(", ");
                let location = ast.location(node);
                let prefix = if show_path {
                    format!("{}:", ast.module(ast.module_of(node)).path)
                } else {
                    String::new()
                };
                diag.out_ln(&format!(
                    "{prefix}{location} {} = {{{labels}}}",
                    ast.label(node)
                ));
            }
            Err(err) => {
                diag.err_ln(&err.to_string());
                failed = true;
            }
        }
    }

    for diagnostic in session.drain_diagnostics() {
        diag.err_ln(&diagnostic.to_string());
    }

    if opts.stats {
        let stats = session.stats();
        diag.out_ln(&format!(
            "evaluations: {}, updates: {}, queries: {}",
            stats.evaluations, stats.updates, stats.queries
        ));
    }

    (!failed).then_some(())
}

#[cfg(test)]
mod driver_tests;
