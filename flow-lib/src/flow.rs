//! The demand-driven value-flow analysis.
//!
//! Every question is a [`Query`] over a [`Config`]: a program point reached
//! under an environment of call strings. The five mutually recursive
//! queries are solved by the fixpoint engine of the `analysis` crate:
//!
//! * `Evaluate`: the constructors an expression may evaluate to.
//! * `Applied`: the calls invoking a function value.
//! * `Traced`: the expressions a value flows to.
//! * `Callers`: the call sites entering a function body under a context.
//! * `Bind`: the origins of a variable.
//!
//! Every query is also answered for the refinements of its configuration:
//! a `Question` context is replaced by each concrete context the function
//! was entered with so far. Calls record those contexts out of band, which
//! sharpens answers computed before the call was discovered.

use analysis::{
    contexts::{Context, ContextArena, ContextId, EnvArena, EnvId},
    domains::JoinSemiLatticeNoContext,
    fixpoint::{Equations, Fix},
};
use indexmap::{IndexMap, IndexSet};
use itertools::Itertools;
use rustc_hash::FxHashSet;
use tracing::{debug, trace};

use crate::{
    ast::{Ast, BinaryOp, NodeId, NodeKind, UnaryOp},
    builtins::{BuiltinId, Catalogue, Entry, Kind, Shape},
    cursor::{Config, ConfigSet, Cursor, Query, QueryKind},
    program::Program,
    scope::Scopes,
    session::{AnalysisError, Diagnostic, FlowOptions},
};

mod bind;
mod evaluate;
mod traced;

pub type FlowResult<T> = Result<T, AnalysisError>;

/// A call or access site handed to builtin summaries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Site {
    pub node: NodeId,
    pub env: EnvId,
}

/// What a callee expression may invoke.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Target {
    Function(Config),
    Builtin(BuiltinId),
    External,
}

/// Re-entrant value operations that do not go through the solver.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum Visit {
    Kinds(Config),
    Property(Config, String),
    Elements(Config, Option<u32>),
}

pub struct FlowAnalyzer<'p> {
    program: &'p Program,
    catalogue: Catalogue,
    options: FlowOptions,
    targets: FxHashSet<NodeId>,
    contexts: ContextArena<NodeId, NodeId>,
    envs: EnvArena,
    root: EnvId,
    /// Reports of the latest evaluation of each query.
    diagnostics: IndexMap<Query, IndexSet<Diagnostic>>,
    active: FxHashSet<Visit>,
}

impl<'p> FlowAnalyzer<'p> {
    pub fn new(program: &'p Program, catalogue: Catalogue, options: FlowOptions) -> Self {
        let contexts = ContextArena::new();
        let mut envs = EnvArena::new();
        let root = envs.intern(&[contexts.stack_bottom()]);
        let targets = options.targets.iter().copied().collect();
        Self {
            program,
            catalogue,
            options,
            targets,
            contexts,
            envs,
            root,
            diagnostics: IndexMap::new(),
            active: FxHashSet::default(),
        }
    }

    pub fn program(&self) -> &'p Program {
        self.program
    }

    pub fn root(&self) -> EnvId {
        self.root
    }

    pub fn top_level(&mut self, node: NodeId) -> EnvId {
        let chain = function_chain(self.program.ast(), node, false);
        env_for(&mut self.contexts, &mut self.envs, &chain, self.root)
    }

    pub fn push_context(&mut self, site: NodeId, head: ContextId) -> ContextId {
        self.contexts.push(site, head, self.options.m)
    }

    pub fn env(&mut self, contexts: &[ContextId]) -> EnvId {
        self.envs.intern(contexts)
    }

    pub fn env_contexts(&self, env: EnvId) -> &[ContextId] {
        self.envs.get(env)
    }

    pub fn drain_diagnostics(&mut self) -> Vec<Diagnostic> {
        self.diagnostics
            .drain(..)
            .flat_map(|(_, reports)| reports)
            .unique()
            .collect()
    }

    pub fn label(&self, cursor: Cursor) -> String {
        let ast = self.program.ast();
        match cursor {
            Cursor::Syntax(node) => ast.label(node),
            Cursor::ArgumentList { call, position } => {
                format!("args({})[{position}..]", ast.label(call))
            }
            Cursor::ElementPick {
                expression,
                position: Some(position),
            } => format!("elem({})[{position}]", ast.label(expression)),
            Cursor::ElementPick {
                expression,
                position: None,
            } => format!("elem({})[*]", ast.label(expression)),
            Cursor::External => "<external>".to_owned(),
        }
    }

    pub fn render_context(&self, ctx: ContextId) -> String {
        let ast = self.program.ast();
        self.contexts.render(
            ctx,
            &|site| ast.location(site).to_string(),
            &|function| ast.function_name(function).unwrap_or("<anonymous>").to_owned(),
        )
    }

    pub fn render_env(&self, env: EnvId) -> String {
        let contexts = self
            .envs
            .get(env)
            .iter()
            .map(|&ctx| self.render_context(ctx))
            .join(" | ");
        format!("<{contexts}>")
    }
}

impl<'p> Equations for FlowAnalyzer<'p> {
    type Query = Query;
    type Value = ConfigSet;
    type Error = AnalysisError;

    fn evaluate(&mut self, query: &Query, fix: &mut Fix<'_, Self>) -> FlowResult<ConfigSet> {
        // Only the evaluation seeing the final values of its reads reports.
        if let Some(reports) = self.diagnostics.get_mut(query) {
            reports.clear();
        }
        Demand { flow: self, fix }.solve(*query)
    }
}

/// The functions whose bodies enclose `node`, innermost first. With
/// `include_self`, a function node counts as enclosing itself, i.e., the
/// chain describes its body.
pub(crate) fn function_chain(ast: &Ast, node: NodeId, include_self: bool) -> Vec<NodeId> {
    let mut chain = Vec::new();
    if include_self && ast.is_function(node) {
        chain.push(node);
    }
    let mut current = ast.enclosing_function(node);
    while let Some(function) = current {
        chain.push(function);
        current = ast.enclosing_function(function);
    }
    chain
}

/// Resizes `env` to the environment of a point enclosed by the functions of
/// `chain`. Contexts of functions the point is not in are dropped, the
/// missing inner ones are unconstrained.
fn env_for(
    contexts: &mut ContextArena<NodeId, NodeId>,
    envs: &mut EnvArena,
    chain: &[NodeId],
    env: EnvId,
) -> EnvId {
    let len = chain.len() + 1;
    let current = envs.depth(env);
    if current >= len {
        return envs.drop_inner(env, current - len);
    }
    let prefix: Vec<ContextId> = chain[..len - current]
        .iter()
        .map(|&function| contexts.question(function))
        .collect();
    envs.extend(&prefix, env)
}

/// The state of one right-hand side evaluation: the analyzer and the
/// solver handle used to read other queries.
pub struct Demand<'a, 'f, 'p> {
    flow: &'a mut FlowAnalyzer<'p>,
    fix: &'a mut Fix<'f, FlowAnalyzer<'p>>,
}

impl<'p> Demand<'_, '_, 'p> {
    fn solve(&mut self, query: Query) -> FlowResult<ConfigSet> {
        trace!(?query, "solving");
        let config = query.config;
        let mut result = match query.kind {
            QueryKind::Evaluate => self.evaluate_config(config)?,
            QueryKind::Applied => self.applied_config(config)?,
            QueryKind::Traced => self.traced_config(config)?,
            QueryKind::Callers => self.callers_config(config)?,
            QueryKind::Bind => self.bind_config(config)?,
            QueryKind::Entered => return Ok(ConfigSet::default()),
        };
        for refined in self.refinements(config)? {
            let values = self.query(query.kind, refined)?;
            result.join_assign_(&values);
        }
        Ok(result)
    }

    /// The configurations obtained by replacing one `Question` context of
    /// the environment by a context its function was entered with.
    fn refinements(&mut self, config: Config) -> FlowResult<Vec<Config>> {
        let contexts = self.flow.envs.get(config.env).to_vec();
        let mut result = Vec::new();
        for (idx, &ctx) in contexts.iter().enumerate() {
            let Context::Question(function) = *self.flow.contexts.get(ctx) else {
                continue;
            };
            if idx + 1 >= contexts.len() {
                continue;
            }
            let outer = self.flow.envs.intern(&contexts[idx + 1..]);
            let entered = self.query(QueryKind::Entered, Config::new(function, outer))?;
            for fact in entered.iter().sorted() {
                let head = self.flow.envs.head(fact.env);
                if head == ctx {
                    continue;
                }
                let env = self.flow.envs.replace(config.env, idx, head);
                result.push(Config { env, ..config });
            }
        }
        Ok(result)
    }

    ///////////////
    //  Queries  //
    ///////////////

    fn query(&mut self, kind: QueryKind, config: Config) -> FlowResult<ConfigSet> {
        self.fix.run(Query::new(kind, config))
    }

    pub fn evaluate(&mut self, config: Config) -> FlowResult<ConfigSet> {
        self.query(QueryKind::Evaluate, config)
    }

    pub fn bind(&mut self, config: Config) -> FlowResult<ConfigSet> {
        self.query(QueryKind::Bind, config)
    }

    pub fn traced(&mut self, config: Config) -> FlowResult<ConfigSet> {
        self.query(QueryKind::Traced, config)
    }

    pub fn callers(&mut self, config: Config) -> FlowResult<ConfigSet> {
        self.query(QueryKind::Callers, config)
    }

    pub fn values(&mut self, node: NodeId, env: EnvId) -> FlowResult<ConfigSet> {
        self.evaluate(Config::new(node, env))
    }

    /// Evaluates every origin and joins the results.
    pub fn evaluate_all(&mut self, origins: &ConfigSet) -> FlowResult<ConfigSet> {
        let mut result = ConfigSet::default();
        for origin in origins.iter().sorted() {
            result.join_assign_(&self.evaluate(*origin)?);
        }
        Ok(result)
    }

    fn push_cache(&mut self, kind: QueryKind, config: Config, facts: ConfigSet) {
        if self.fix.push_cache(Query::new(kind, config), &facts) {
            debug!(?kind, ?config, "recorded facts");
        }
    }

    ///////////////
    //  Helpers  //
    ///////////////

    pub fn program(&self) -> &'p Program {
        self.flow.program
    }

    pub fn ast(&self) -> &'p Ast {
        self.flow.program.ast()
    }

    pub fn scopes(&self) -> &'p Scopes {
        self.flow.program.scopes()
    }

    pub fn root(&self) -> EnvId {
        self.flow.root
    }

    pub fn external(&self) -> Config {
        Config::new(Cursor::External, self.flow.root)
    }

    pub fn external_set(&self) -> ConfigSet {
        ConfigSet::singleton(self.external())
    }

    pub fn top_level(&mut self, node: NodeId) -> EnvId {
        self.flow.top_level(node)
    }

    /// The environment of `node`, seen from a point under `env` that
    /// lexically encloses it or is enclosed by it.
    pub fn env_at(&mut self, node: NodeId, env: EnvId) -> EnvId {
        let chain = function_chain(self.ast(), node, false);
        env_for(&mut self.flow.contexts, &mut self.flow.envs, &chain, env)
    }

    /// The environment of the names declared in the scope owned by `scope`.
    pub fn scope_env(&mut self, scope: NodeId, env: EnvId) -> EnvId {
        let chain = function_chain(self.ast(), scope, true);
        env_for(&mut self.flow.contexts, &mut self.flow.envs, &chain, env)
    }

    /// The body environment of `function` entered from `call` under `env`.
    pub fn enter(&mut self, function: Config, call: NodeId, env: EnvId) -> EnvId {
        let head = self.flow.envs.head(env);
        let ctx = self.flow.contexts.push(call, head, self.flow.options.m);
        self.flow.envs.cons(ctx, function.env)
    }

    pub fn is_target(&self, function: NodeId) -> bool {
        self.flow.targets.contains(&function)
    }

    pub fn unsupported(&mut self, node: NodeId, message: impl Into<String>) {
        let ast = self.ast();
        let diagnostic = Diagnostic {
            line: ast.line(node),
            label: ast.label(node),
            message: message.into(),
        };
        let query = *self.fix.current();
        let reports = self.flow.diagnostics.entry(query).or_default();
        if reports.insert(diagnostic.clone()) {
            debug!(%diagnostic, "unsupported construct");
        }
    }

    /// Runs `op` unless the same operation is already in progress, in which
    /// case the inner occurrence contributes nothing. Nothing is lost: every
    /// value read by `op` goes through [`Fix::run`], so the outer occurrence
    /// still depends on it and is evaluated again when it grows.
    fn guarded<T: Default>(
        &mut self,
        key: Visit,
        op: impl FnOnce(&mut Self) -> FlowResult<T>,
    ) -> FlowResult<T> {
        if !self.flow.active.insert(key.clone()) {
            return Ok(T::default());
        }
        let result = op(self);
        self.flow.active.remove(&key);
        result
    }

    /////////////
    //  Calls  //
    /////////////

    /// Invokes a function value at `call`. Records that the call enters the
    /// function body under the pushed context, then evaluates the returned
    /// expressions there. An `async` function returns the call itself: a
    /// promise awaiting unwraps.
    pub fn apply(&mut self, function: Config, call: NodeId, env: EnvId) -> FlowResult<ConfigSet> {
        let Some(node) = function.node() else {
            return Ok(self.external_set());
        };
        self.enter_from(function, Cursor::Syntax(call), call, env);
        if self.ast().function_flags(node).is_some_and(|flags| flags.is_async) {
            return Ok(ConfigSet::singleton(Config::new(call, env)));
        }
        let body_env = self.enter(function, call, env);
        self.returns(node, body_env)
    }

    /// Invokes a callback passed at `position` to the builtin called at
    /// `call`. The parameters of the callback are bound by the builtin.
    pub fn apply_callback(
        &mut self,
        function: Config,
        call: NodeId,
        position: u32,
        env: EnvId,
    ) -> FlowResult<ConfigSet> {
        let Some(node) = function.node() else {
            return Ok(self.external_set());
        };
        let body_env = self.enter_callback(function, call, position, env);
        self.returns(node, body_env)
    }

    /// The body environment of a callback invoked by the builtin called at
    /// `call`, recording the invocation.
    pub fn enter_callback(&mut self, function: Config, call: NodeId, position: u32, env: EnvId) -> EnvId {
        self.enter_from(function, Cursor::ArgumentList { call, position }, call, env)
    }

    /// Records that `caller` enters the body of `function` with the context
    /// of `call`, and returns the body environment.
    fn enter_from(&mut self, function: Config, caller: Cursor, call: NodeId, env: EnvId) -> EnvId {
        let body_env = self.enter(function, call, env);
        let Some(node) = function.node() else {
            return body_env;
        };
        self.push_cache(
            QueryKind::Callers,
            Config::new(node, body_env),
            ConfigSet::singleton(Config::new(caller, env)),
        );
        self.push_cache(
            QueryKind::Entered,
            Config::new(node, function.env),
            ConfigSet::singleton(Config::new(node, body_env)),
        );
        body_env
    }

    /// The values returned by `function` when its body runs under `body_env`.
    pub fn returns(&mut self, function: NodeId, body_env: EnvId) -> FlowResult<ConfigSet> {
        let mut result = ConfigSet::default();
        for value in self.ast().returned_values(function) {
            result.join_assign_(&self.values(value, body_env)?);
        }
        Ok(result)
    }

    /// The receiver of a method call: the object of the member callee.
    pub fn receiver(&self, call: NodeId) -> Option<NodeId> {
        let ast = self.ast();
        let (callee, _) = ast.call_parts(call)?;
        match ast.kind(callee) {
            NodeKind::Member { object, .. } => Some(*object),
            _ => None,
        }
    }

    pub fn argument(&self, call: NodeId, position: usize) -> Option<NodeId> {
        let (_, arguments) = self.ast().call_parts(call)?;
        arguments.get(position).copied()
    }

    pub fn builtin_entry(&self, id: BuiltinId) -> Entry {
        *self.flow.catalogue.entry(id)
    }

    fn single_builtin(&self, node: NodeId, ids: Vec<BuiltinId>) -> FlowResult<Option<BuiltinId>> {
        match ids.as_slice() {
            [] => Ok(None),
            [id] => Ok(Some(*id)),
            _ => {
                let ast = self.ast();
                Err(AnalysisError::AmbiguousBuiltin {
                    line: ast.line(node),
                    label: ast.label(node),
                    candidates: ids
                        .iter()
                        .map(|&id| self.flow.catalogue.entry(id).shape.to_string())
                        .collect(),
                })
            }
        }
    }

    /// Looks up a builtin for a value that is known to be a global name.
    fn lookup(&self, node: NodeId, shape: Shape<'_>) -> FlowResult<Option<BuiltinId>> {
        let ids = self.flow.catalogue.lookup(shape);
        self.single_builtin(node, ids)
    }

    /// The name of an undeclared identifier the catalogue knows about.
    pub fn global_name(&self, node: NodeId) -> Option<&'p str> {
        let ast = self.ast();
        let NodeKind::Identifier { name } = ast.kind(node) else {
            return None;
        };
        if self.scopes().symbol_at(node).is_some() {
            return None;
        }
        let name = ast.name(*name);
        self.flow.catalogue.is_global(name).then_some(name)
    }

    /// The functions and builtins the callee of a call may invoke.
    pub fn callee_targets(&mut self, callee: NodeId, env: EnvId) -> FlowResult<Vec<Target>> {
        let ast = self.ast();
        let mut targets = Vec::new();
        if let NodeKind::Member {
            object, property, ..
        } = *ast.kind(callee)
        {
            let name = ast.name(property);
            let receivers = self.values(object, env)?;
            for receiver in receivers.iter().sorted() {
                self.member_targets(callee, *receiver, name, &mut targets)?;
            }
        } else {
            let values = self.values(callee, env)?;
            for value in values.iter().sorted() {
                self.value_targets(callee, *value, &mut targets)?;
            }
        }
        Ok(targets.into_iter().unique().collect())
    }

    fn value_targets(&mut self, callee: NodeId, value: Config, targets: &mut Vec<Target>) -> FlowResult<()> {
        match value.cursor {
            Cursor::External => targets.push(Target::External),
            Cursor::Syntax(node) if self.ast().is_function(node) => {
                targets.push(Target::Function(value));
            }
            Cursor::Syntax(node) => match self.global_name(node) {
                Some(name) => match self.lookup(callee, Shape::Global(name))? {
                    Some(id) => targets.push(Target::Builtin(id)),
                    None => self.unsupported(callee, format!("'{name}' cannot be called.")),
                },
                None => self.unsupported(callee, "Callee is not a function."),
            },
            _ => self.unsupported(callee, "Callee is not a function."),
        }
        Ok(())
    }

    fn member_targets(
        &mut self,
        callee: NodeId,
        receiver: Config,
        name: &str,
        targets: &mut Vec<Target>,
    ) -> FlowResult<()> {
        let ast = self.ast();
        match receiver.cursor {
            Cursor::External => {
                targets.push(Target::External);
                return Ok(());
            }
            Cursor::Syntax(node)
                if matches!(ast.kind(node), NodeKind::Object { .. } | NodeKind::Module { .. }) =>
            {
                let methods = self.property_values(&ConfigSet::singleton(receiver), name, None)?;
                for method in methods.iter().sorted() {
                    self.value_targets(callee, *method, targets)?;
                }
                return Ok(());
            }
            Cursor::Syntax(node) => {
                if let Some(namespace) = self.global_name(node) {
                    match self.lookup(callee, Shape::Static(namespace, name))? {
                        Some(id) => targets.push(Target::Builtin(id)),
                        None => self.unsupported(callee, format!("Unknown function '{namespace}.{name}'.")),
                    }
                    return Ok(());
                }
            }
            _ => {}
        }

        let kinds = self.value_kinds(receiver)?;
        let mut found = false;
        for kind in kinds {
            if let Some(id) = self.lookup(callee, Shape::Method(kind, name))? {
                targets.push(Target::Builtin(id));
                found = true;
            }
        }
        if !found {
            self.unsupported(callee, format!("Unknown method '{name}'."));
        }
        Ok(())
    }

    /// The builtin constructing the value of a `new` expression.
    fn constructor(&mut self, new: NodeId) -> FlowResult<Option<BuiltinId>> {
        let Some((callee, _)) = self.ast().call_parts(new) else {
            return Ok(None);
        };
        match self.global_name(callee) {
            Some(name) => self.lookup(new, Shape::Constructor(name)),
            None => Ok(None),
        }
    }

    /// The builtins whose result a call, `new` or getter access node is.
    pub fn builtins_at(&mut self, node: NodeId, env: EnvId) -> FlowResult<Vec<BuiltinId>> {
        let ast = self.ast();
        match *ast.kind(node) {
            NodeKind::Call { callee, .. } => {
                let targets = self.callee_targets(callee, env)?;
                Ok(targets
                    .into_iter()
                    .filter_map(|target| match target {
                        Target::Builtin(id) => Some(id),
                        _ => None,
                    })
                    .collect())
            }
            NodeKind::New { .. } => Ok(self.constructor(node)?.into_iter().collect()),
            NodeKind::Member {
                object, property, ..
            } => {
                let name = ast.name(property);
                let mut result = Vec::new();
                for receiver in self.values(object, env)?.iter().sorted() {
                    let namespace = receiver.node().and_then(|node| self.global_name(node));
                    let shapes = match namespace {
                        Some(namespace) => vec![Shape::Static(namespace, name)],
                        None => self
                            .value_kinds(*receiver)?
                            .into_iter()
                            .map(|kind| Shape::Method(kind, name))
                            .collect(),
                    };
                    for shape in shapes {
                        if let Some(id) = self.lookup(node, shape)? {
                            if self.builtin_entry(id).getter {
                                result.push(id);
                            }
                        }
                    }
                }
                Ok(result.into_iter().unique().collect())
            }
            _ => Ok(Vec::new()),
        }
    }

    /// The kinds of builtin objects a value may be.
    pub fn value_kinds(&mut self, value: Config) -> FlowResult<Vec<Kind>> {
        self.guarded(Visit::Kinds(value), |demand| demand.value_kinds_of(value))
    }

    fn value_kinds_of(&mut self, value: Config) -> FlowResult<Vec<Kind>> {
        let node = match value.cursor {
            Cursor::Syntax(node) => node,
            Cursor::ArgumentList { .. } => return Ok(vec![Kind::Array]),
            Cursor::ElementPick { .. } | Cursor::External => return Ok(Vec::new()),
        };
        let ast = self.ast();
        let kind = match ast.kind(node) {
            NodeKind::Array { .. } => Kind::Array,
            NodeKind::Str { .. } | NodeKind::Template { .. } => Kind::String,
            NodeKind::Number { .. } | NodeKind::Update { .. } => Kind::Number,
            NodeKind::Bool { .. } => Kind::Boolean,
            NodeKind::Object { .. } => Kind::Object,
            NodeKind::Function { .. } => Kind::Function,
            NodeKind::Binary { op, .. } if op.is_comparison() => Kind::Boolean,
            NodeKind::Binary { op, .. } if *op != BinaryOp::Add => Kind::Number,
            NodeKind::Unary { op: UnaryOp::Not, .. } => Kind::Boolean,
            NodeKind::Unary { op: UnaryOp::Typeof, .. } => Kind::String,
            NodeKind::Unary {
                op: UnaryOp::Neg | UnaryOp::Plus,
                ..
            } => Kind::Number,
            NodeKind::Identifier { .. } => match self.global_name(node) {
                Some(name) if self.flow.catalogue.is_namespace(name) => Kind::Namespace,
                Some(_) => Kind::Function,
                None => return Ok(Vec::new()),
            },
            NodeKind::Call { callee, .. } => {
                let mut kinds = Vec::new();
                for target in self.callee_targets(*callee, value.env)? {
                    match target {
                        Target::Function(function) => {
                            let is_async = function
                                .node()
                                .and_then(|f| ast.function_flags(f))
                                .is_some_and(|flags| flags.is_async);
                            if is_async {
                                kinds.push(Kind::Promise);
                            }
                        }
                        Target::Builtin(id) => kinds.extend(self.builtin_entry(id).produces),
                        Target::External => {}
                    }
                }
                return Ok(kinds.into_iter().unique().collect());
            }
            NodeKind::New { .. } | NodeKind::Member { .. } => {
                let ids = self.builtins_at(node, value.env)?;
                return Ok(ids
                    .into_iter()
                    .filter_map(|id| self.builtin_entry(id).produces)
                    .unique()
                    .collect());
            }
            _ => return Ok(Vec::new()),
        };
        Ok(vec![kind])
    }
}
