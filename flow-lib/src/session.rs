use analysis::{
    contexts::{ContextId, EnvId},
    fixpoint::{FixpointSolver, SolverStats},
};
use itertools::Itertools;
use thiserror::Error;

use crate::{
    ast::NodeId,
    builtins::Catalogue,
    cursor::{Config, ConfigSet, Query, QueryKind},
    flow::FlowAnalyzer,
    program::Program,
};

/// Fatal conditions. They stop the solve and are reported with the location
/// of the offending expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    #[error("[line {line}] No declaration found for '{label}'.")]
    MissingDeclaration { line: u32, label: String },

    #[error("[line {line}] Ambiguous builtin for '{label}': {}.", .candidates.join(", "))]
    AmbiguousBuiltin {
        line: u32,
        label: String,
        candidates: Vec<String>,
    },
}

/// A construct the analysis has no rule for. The affected sub-computation
/// contributes no values.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Diagnostic {
    pub line: u32,
    pub label: String,
    pub message: String,
}

impl core::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "[line {}] Unsupported '{}': {}", self.line, self.label, self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowOptions {
    /// Maximum number of call sites kept in a context.
    pub m: usize,
    /// Functions whose parameters are unconstrained.
    pub targets: Vec<NodeId>,
}

impl Default for FlowOptions {
    fn default() -> Self {
        Self {
            m: 1,
            targets: Vec::new(),
        }
    }
}

/// One analysis of one program. Owns the solver, so memoized results are
/// shared by every query asked through the same session.
pub struct FlowSession<'p> {
    analyzer: FlowAnalyzer<'p>,
    solver: FixpointSolver<FlowAnalyzer<'p>>,
}

impl<'p> FlowSession<'p> {
    pub fn new(program: &'p Program, options: FlowOptions) -> Self {
        Self::with_catalogue(program, options, Catalogue::standard())
    }

    pub fn with_catalogue(program: &'p Program, options: FlowOptions, catalogue: Catalogue) -> Self {
        Self {
            analyzer: FlowAnalyzer::new(program, catalogue, options),
            solver: FixpointSolver::new(),
        }
    }

    pub fn program(&self) -> &'p Program {
        self.analyzer.program()
    }

    /// The environment of the module level.
    pub fn root(&self) -> EnvId {
        self.analyzer.root()
    }

    /// `node` under unconstrained contexts: any caller for every enclosing
    /// function.
    pub fn top_level(&mut self, node: NodeId) -> Config {
        let env = self.analyzer.top_level(node);
        Config::new(node, env)
    }

    /// Pushes `site` onto `head`, truncated to the bound of the session.
    pub fn push_context(&mut self, site: NodeId, head: ContextId) -> ContextId {
        self.analyzer.push_context(site, head)
    }

    pub fn env(&mut self, contexts: &[ContextId]) -> EnvId {
        self.analyzer.env(contexts)
    }

    pub fn env_contexts(&self, env: EnvId) -> &[ContextId] {
        self.analyzer.env_contexts(env)
    }

    pub fn solve(&mut self, query: Query) -> Result<ConfigSet, AnalysisError> {
        self.solver.value_of(&mut self.analyzer, query)
    }

    pub fn evaluate(&mut self, config: Config) -> Result<ConfigSet, AnalysisError> {
        self.solve(Query::new(QueryKind::Evaluate, config))
    }

    pub fn bind(&mut self, config: Config) -> Result<ConfigSet, AnalysisError> {
        self.solve(Query::new(QueryKind::Bind, config))
    }

    pub fn traced(&mut self, config: Config) -> Result<ConfigSet, AnalysisError> {
        self.solve(Query::new(QueryKind::Traced, config))
    }

    pub fn applied(&mut self, config: Config) -> Result<ConfigSet, AnalysisError> {
        self.solve(Query::new(QueryKind::Applied, config))
    }

    pub fn callers(&mut self, config: Config) -> Result<ConfigSet, AnalysisError> {
        self.solve(Query::new(QueryKind::Callers, config))
    }

    /// Joins facts into a query from the outside. Readers of the query are
    /// recomputed on the next solve.
    pub fn push_cache(&mut self, query: Query, value: &ConfigSet) -> bool {
        self.solver.push_cache(query, value)
    }

    pub fn drain_diagnostics(&mut self) -> Vec<Diagnostic> {
        self.analyzer.drain_diagnostics()
    }

    pub fn stats(&self) -> SolverStats {
        self.solver.stats()
    }

    pub fn label(&self, config: Config) -> String {
        self.analyzer.label(config.cursor)
    }

    /// Sorted, distinct labels of the configurations.
    pub fn label_set(&self, set: &ConfigSet) -> Vec<String> {
        set.iter()
            .map(|config| self.label(*config))
            .sorted()
            .dedup()
            .collect()
    }

    /// The label of the configuration followed by its environment.
    pub fn describe(&self, config: Config) -> String {
        format!(
            "{} {}",
            self.label(config),
            self.analyzer.render_env(config.env)
        )
    }

    pub fn render_env(&self, env: EnvId) -> String {
        self.analyzer.render_env(env)
    }
}
