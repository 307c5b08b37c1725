use analysis::{contexts::EnvId, domains::JoinSemiLatticeNoContext};
use itertools::Itertools;

use super::{Demand, FlowResult, Site, Target};
use crate::{
    ast::{AssignOp, NodeId, NodeKind, PropKey},
    cursor::{Config, ConfigSet, Cursor},
    scope::ImportTarget,
    session::AnalysisError,
};

/// One step from a destructuring pattern down to a binding inside it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Step {
    Property(PropKey),
    Index(u32),
    Rest,
    Default(NodeId),
}

impl Demand<'_, '_, '_> {
    /// The right-hand side of `Bind`: the origins of the variable an
    /// identifier or binding occurrence refers to, that is its initializer
    /// or parameter values together with every value assigned to it later.
    pub(super) fn bind_config(&mut self, config: Config) -> FlowResult<ConfigSet> {
        let Some(node) = config.node() else {
            return Ok(ConfigSet::default());
        };
        let scopes = self.scopes();
        let Some(id) = scopes.symbol_at(node) else {
            return Err(self.missing_declaration(node));
        };
        let decl = scopes.decl(id);
        let decl_env = self.scope_env(decl.scope, config.env);
        let mut result = self.binding_origins(decl.binding, decl_env)?;
        for &reference in scopes.find_references(id) {
            let env = self.env_at(reference, decl_env);
            result.join_assign_(&self.mutation_origins(reference, env)?);
        }
        Ok(result)
    }

    fn missing_declaration(&self, node: NodeId) -> AnalysisError {
        let ast = self.ast();
        AnalysisError::MissingDeclaration {
            line: ast.line(node),
            label: ast.label(node),
        }
    }

    /// Walks up from a binding or assignment target to the outermost
    /// pattern containing it. Returns the pattern and the steps leading from
    /// it back to `node`.
    fn pattern_root(&self, node: NodeId) -> (NodeId, Vec<Step>) {
        let ast = self.ast();
        let mut steps = Vec::new();
        let mut current = node;
        while let Some(parent) = ast.parent(current) {
            match ast.kind(parent) {
                NodeKind::Property { key, value, .. } if *value == current => {
                    let in_pattern = ast
                        .parent(parent)
                        .is_some_and(|pattern| matches!(ast.kind(pattern), NodeKind::ObjectPattern { .. }));
                    if !in_pattern {
                        break;
                    }
                    steps.push(Step::Property(*key));
                }
                NodeKind::ObjectPattern { .. } => {}
                NodeKind::ArrayPattern { elements } => {
                    if !matches!(ast.kind(current), NodeKind::Rest { .. }) {
                        let Some(idx) = elements.iter().position(|element| *element == Some(current)) else {
                            break;
                        };
                        steps.push(Step::Index(idx as u32));
                    }
                }
                NodeKind::AssignPattern { target, default } if *target == current => {
                    steps.push(Step::Default(*default));
                }
                NodeKind::Rest { .. } => {
                    let in_params = ast
                        .parent(parent)
                        .is_some_and(|function| ast.is_function(function));
                    if in_params {
                        current = parent;
                        break;
                    }
                    steps.push(Step::Rest);
                }
                _ => break,
            }
            current = parent;
        }
        steps.reverse();
        (current, steps)
    }

    /// The origins of the binding occurrence of a declaration.
    fn binding_origins(&mut self, binding: NodeId, env: EnvId) -> FlowResult<ConfigSet> {
        let ast = self.ast();
        let (root, steps) = self.pattern_root(binding);
        let Some(parent) = ast.parent(root) else {
            return Err(self.missing_declaration(binding));
        };
        let origins = match *ast.kind(parent) {
            NodeKind::Declarator { target, init } if target == root => match init {
                Some(init) => {
                    let env = self.env_at(init, env);
                    ConfigSet::singleton(Config::new(init, env))
                }
                None => self.loop_origins(parent, env)?,
            },
            NodeKind::Function { name, ref params, .. } => {
                if name == Some(root) {
                    let env = self.env_at(parent, env);
                    ConfigSet::singleton(Config::new(parent, env))
                } else if let Some(position) = params.iter().position(|&param| param == root) {
                    let is_rest = matches!(ast.kind(root), NodeKind::Rest { .. });
                    self.param_origins(parent, position as u32, is_rest, env)?
                } else {
                    return Err(self.missing_declaration(binding));
                }
            }
            NodeKind::Catch { param, .. } if param == Some(root) => self.catch_origins(parent, env)?,
            NodeKind::ImportSpecifier { local, .. } if local == root => self.import_origins(binding)?,
            _ => return Err(self.missing_declaration(binding)),
        };
        self.follow_steps(origins, &steps, env)
    }

    /// The values a `for ... of` head declarator without initializer takes.
    fn loop_origins(&mut self, declarator: NodeId, env: EnvId) -> FlowResult<ConfigSet> {
        let ast = self.ast();
        let head = ast.parent(declarator);
        let Some(for_of) = head.and_then(|head| ast.parent(head)) else {
            return Ok(ConfigSet::default());
        };
        match *ast.kind(for_of) {
            NodeKind::ForOf {
                is_in: true,
                head: loop_head,
                ..
            } if Some(loop_head) == head => Ok(self.external_set()),
            NodeKind::ForOf {
                head: loop_head,
                iterated,
                ..
            } if Some(loop_head) == head => Ok(self.iterated_elements(iterated, env)),
            _ => Ok(ConfigSet::default()),
        }
    }

    fn iterated_elements(&mut self, iterated: NodeId, env: EnvId) -> ConfigSet {
        let env = self.env_at(iterated, env);
        let pick = Cursor::ElementPick {
            expression: iterated,
            position: None,
        };
        ConfigSet::singleton(Config::new(pick, env))
    }

    fn import_origins(&mut self, binding: NodeId) -> FlowResult<ConfigSet> {
        let scopes = self.scopes();
        let Some(id) = scopes.symbol_at(binding) else {
            return Err(self.missing_declaration(binding));
        };
        match scopes.resolve_import(id) {
            ImportTarget::Decl(target) => {
                let exported = scopes.decl(target).binding;
                let env = self.top_level(exported);
                self.bind(Config::new(exported, env))
            }
            ImportTarget::Expression(value) => {
                let env = self.top_level(value);
                Ok(ConfigSet::singleton(Config::new(value, env)))
            }
            ImportTarget::Namespace(module) => {
                let root = self.program().root(module);
                Ok(ConfigSet::singleton(Config::new(root, self.root())))
            }
            ImportTarget::External => Ok(self.external_set()),
        }
    }

    /// The arguments passed to a parameter by the callers of the function
    /// body under `env`.
    fn param_origins(
        &mut self,
        function: NodeId,
        position: u32,
        is_rest: bool,
        env: EnvId,
    ) -> FlowResult<ConfigSet> {
        if self.is_target(function) {
            return Ok(self.external_set());
        }
        let body_env = self.scope_env(function, env);
        let callers = self.callers(Config::new(function, body_env))?;
        let mut result = ConfigSet::default();
        for caller in callers.iter().sorted() {
            match caller.cursor {
                Cursor::Syntax(call) if is_rest => {
                    let rest = Cursor::ArgumentList { call, position };
                    result.insert(Config::new(rest, caller.env));
                }
                Cursor::Syntax(call) => {
                    result.join_assign_(&self.argument_origins(call, position, caller.env));
                }
                Cursor::ArgumentList {
                    call,
                    position: callback,
                } => {
                    let site = Site {
                        node: call,
                        env: caller.env,
                    };
                    result.join_assign_(&self.builtin_binding(site, callback, position)?);
                }
                _ => {
                    result.insert(self.external());
                }
            }
        }
        Ok(result)
    }

    /// The argument expression passed at `position`. After a spread
    /// argument the positions are unknown.
    fn argument_origins(&mut self, call: NodeId, position: u32, env: EnvId) -> ConfigSet {
        let ast = self.ast();
        let arguments = ast.call_parts(call).map_or(&[][..], |(_, arguments)| arguments);
        let mut result = ConfigSet::default();
        let mut after_spread = false;
        for (idx, &argument) in arguments.iter().enumerate() {
            if let NodeKind::Spread { argument } = *ast.kind(argument) {
                let pick = Cursor::ElementPick {
                    expression: argument,
                    position: None,
                };
                result.insert(Config::new(pick, env));
                after_spread = true;
                continue;
            }
            if after_spread || idx as u32 == position {
                result.insert(Config::new(argument, env));
            }
            if idx as u32 >= position && !after_spread {
                break;
            }
        }
        result
    }

    /// Asks the builtin called at `site` what it passes to the parameter
    /// `param` of the callback at argument `callback`.
    fn builtin_binding(&mut self, site: Site, callback: u32, param: u32) -> FlowResult<ConfigSet> {
        let Some((callee, _)) = self.ast().call_parts(site.node) else {
            return Ok(self.external_set());
        };
        let mut result = ConfigSet::default();
        for target in self.callee_targets(callee, site.env)? {
            match target {
                Target::Builtin(id) => match self.builtin_entry(id).binder {
                    Some(binder) => {
                        result.join_assign_(&binder(self, site, callback, param)?);
                    }
                    None => {
                        result.insert(self.external());
                    }
                },
                Target::External => {
                    result.insert(self.external());
                }
                Target::Function(_) => {}
            }
        }
        Ok(result)
    }

    /// The values a `catch` parameter may be bound to: what is thrown in the
    /// `try` block or in the functions it calls directly, and anything
    /// thrown by code outside of the program.
    fn catch_origins(&mut self, catch: NodeId, env: EnvId) -> FlowResult<ConfigSet> {
        let ast = self.ast();
        let mut result = self.external_set();
        let Some(NodeKind::Try { block, .. }) = ast.parent(catch).map(|node| ast.kind(node)) else {
            return Ok(result);
        };
        for node in ast.descendants_in_function(*block) {
            match *ast.kind(node) {
                NodeKind::Throw { value } => {
                    result.insert(Config::new(value, env));
                }
                NodeKind::Call { callee, .. } => {
                    for target in self.callee_targets(callee, env)? {
                        let Target::Function(function) = target else {
                            continue;
                        };
                        let Some(NodeKind::Function { body, .. }) = function.node().map(|f| ast.kind(f)) else {
                            continue;
                        };
                        let body_env = self.enter(function, node, env);
                        for thrown in ast.descendants_in_function(*body) {
                            if let NodeKind::Throw { value } = *ast.kind(thrown) {
                                result.insert(Config::new(value, body_env));
                            }
                        }
                    }
                }
                _ => {}
            }
        }
        Ok(result)
    }

    /// The values stored into a variable by an assignment or update of the
    /// reference `reference`, if it is a target of one.
    fn mutation_origins(&mut self, reference: NodeId, env: EnvId) -> FlowResult<ConfigSet> {
        let ast = self.ast();
        let (root, steps) = self.pattern_root(reference);
        let Some(parent) = ast.parent(root) else {
            return Ok(ConfigSet::default());
        };
        let origins = match *ast.kind(parent) {
            NodeKind::Assign { op, target, value } if target == root => match op {
                AssignOp::Assign | AssignOp::Logical(_) => ConfigSet::singleton(Config::new(value, env)),
                AssignOp::Arithmetic(_) if steps.is_empty() => ConfigSet::singleton(Config::new(parent, env)),
                AssignOp::Arithmetic(_) => ConfigSet::default(),
            },
            NodeKind::Update { operand, .. } if operand == root && steps.is_empty() => {
                ConfigSet::singleton(Config::new(parent, env))
            }
            NodeKind::ForOf {
                is_in, head, iterated, ..
            } if head == root => {
                if is_in {
                    self.external_set()
                } else {
                    self.iterated_elements(iterated, env)
                }
            }
            _ => return Ok(ConfigSet::default()),
        };
        self.follow_steps(origins, &steps, env)
    }

    /// Applies destructuring steps to the origins of a pattern. The first
    /// array index stays lazy as an element pick of the destructured
    /// expression, the other steps work on evaluated values.
    fn follow_steps(&mut self, origins: ConfigSet, steps: &[Step], env: EnvId) -> FlowResult<ConfigSet> {
        let Some((first, rest)) = steps.split_first() else {
            return Ok(origins);
        };
        let mut values = match *first {
            Step::Index(position) => {
                let mut picks = ConfigSet::default();
                for origin in origins.iter().sorted() {
                    match origin.cursor {
                        Cursor::Syntax(expression) => {
                            let pick = Cursor::ElementPick {
                                expression,
                                position: Some(position),
                            };
                            picks.insert(Config::new(pick, origin.env));
                        }
                        _ => {
                            let values = self.evaluate(*origin)?;
                            picks.join_assign_(&self.element_values(&values, Some(position))?);
                        }
                    }
                }
                picks
            }
            step => {
                let values = self.evaluate_all(&origins)?;
                self.apply_step(values, step, env)?
            }
        };
        for &step in rest {
            let evaluated = self.evaluate_all(&values)?;
            values = self.apply_step(evaluated, step, env)?;
        }
        Ok(values)
    }

    fn apply_step(&mut self, values: ConfigSet, step: Step, env: EnvId) -> FlowResult<ConfigSet> {
        let ast = self.ast();
        match step {
            Step::Property(PropKey::Named(key)) => self.property_values(&values, ast.name(key), None),
            Step::Property(PropKey::Computed(key)) => match *ast.kind(key) {
                NodeKind::Str { value } => self.property_values(&values, ast.name(value), None),
                NodeKind::Number { text } => self.property_values(&values, ast.name(text), None),
                _ => {
                    self.unsupported(key, "Computed destructuring keys are not modeled.");
                    Ok(ConfigSet::default())
                }
            },
            Step::Index(position) => self.element_values(&values, Some(position)),
            Step::Rest => Ok(values),
            Step::Default(default) => {
                let env = self.env_at(default, env);
                let mut result = values;
                result.join_assign_(&self.values(default, env)?);
                Ok(result)
            }
        }
    }
}
