use analysis::{
    contexts::{Context, ContextId, EnvId},
    domains::JoinSemiLatticeNoContext,
};
use itertools::Itertools;

use super::{Demand, FlowResult, Target};
use crate::{
    ast::{Ast, NodeId, NodeKind, PropKey},
    cursor::{Config, ConfigSet, Cursor},
    scope::{DeclId, ImportTarget},
};

impl Demand<'_, '_, '_> {
    /// The right-hand side of `Traced`: the expressions the value of
    /// `config` flows to, `config` included.
    pub(super) fn traced_config(&mut self, config: Config) -> FlowResult<ConfigSet> {
        let mut result = ConfigSet::singleton(config);
        let Some(node) = config.node() else {
            return Ok(result);
        };
        for next in self.flows_to(node, config.env)? {
            result.join_assign_(&self.traced(next)?);
        }
        Ok(result)
    }

    /// The right-hand side of `Applied`: the calls whose callee is an alias
    /// of the value.
    pub(super) fn applied_config(&mut self, config: Config) -> FlowResult<ConfigSet> {
        let ast = self.ast();
        let aliases = self.traced(config)?;
        Ok(aliases
            .iter()
            .filter_map(|alias| {
                let call = ast.callee_of(alias.node()?)?;
                Some(Config::new(call, alias.env))
            })
            .collect())
    }

    /// The right-hand side of `Callers`: the calls entering the body of a
    /// function under the head context of its environment. Calls made by
    /// builtins on a callback argument are reported as the argument list of
    /// the call the callback was passed to.
    pub(super) fn callers_config(&mut self, config: Config) -> FlowResult<ConfigSet> {
        let Some(function) = config.node() else {
            return Ok(ConfigSet::default());
        };
        if !self.ast().is_function(function) {
            return Ok(ConfigSet::default());
        }
        let head = self.flow.envs.head(config.env);
        let outer = self.flow.envs.drop_inner(config.env, 1);
        let sinks = self.traced(Config::new(function, outer))?;
        let ast = self.ast();
        let mut result = ConfigSet::default();
        for sink in sinks.iter().sorted() {
            let Some(node) = sink.node() else {
                continue;
            };
            if let Some(call) = ast.callee_of(node) {
                if let Some(env) = self.matching_caller(call, sink.env, head) {
                    result.insert(Config::new(call, env));
                }
                continue;
            }
            let Some((call, position)) = ast.argument_of(node) else {
                continue;
            };
            if !self.calls_outside(call, sink.env)? {
                continue;
            }
            if let Some(env) = self.matching_caller(call, sink.env, head) {
                let arguments = Cursor::ArgumentList {
                    call,
                    position: position as u32,
                };
                result.insert(Config::new(arguments, env));
            }
        }
        Ok(result)
    }

    /// The environment of a call at `call` under `env` whose pushed context
    /// is compatible with `head`, if there is one.
    fn matching_caller(&mut self, call: NodeId, env: EnvId, head: ContextId) -> Option<EnvId> {
        let caller_head = self.flow.envs.head(env);
        let pushed = self.flow.contexts.push(call, caller_head, self.flow.options.m);
        if self.flow.contexts.refines(pushed, head) {
            return Some(env);
        }
        match *self.flow.contexts.get(head) {
            Context::Frame { site, tail } if site == call && self.flow.contexts.refines(tail, caller_head) => {
                Some(self.flow.envs.replace(env, 0, tail))
            }
            _ => None,
        }
    }

    /// Whether the call may invoke a builtin or code outside of the program,
    /// which in turn may invoke its function arguments.
    fn calls_outside(&mut self, call: NodeId, env: EnvId) -> FlowResult<bool> {
        let Some((callee, _)) = self.ast().call_parts(call) else {
            return Ok(false);
        };
        let targets = self.callee_targets(callee, env)?;
        Ok(targets
            .iter()
            .any(|target| matches!(target, Target::Builtin(_) | Target::External)))
    }

    /// The references of a declaration, seen from `env`, including the
    /// references of the imports resolving to it.
    fn declaration_refs(&mut self, id: DeclId, env: EnvId) -> Vec<Config> {
        let scopes = self.scopes();
        let mut result = Vec::new();
        for &reference in scopes.find_references(id) {
            let env = self.env_at(reference, env);
            result.push(Config::new(reference, env));
        }
        for &importer in scopes.importers(ImportTarget::Decl(id)) {
            result.extend(self.import_refs(importer));
        }
        result
    }

    fn import_refs(&mut self, importer: DeclId) -> Vec<Config> {
        let scopes = self.scopes();
        let mut result = Vec::new();
        for &reference in scopes.find_references(importer) {
            let env = self.top_level(reference);
            result.push(Config::new(reference, env));
        }
        for &reexport in scopes.importers(ImportTarget::Decl(importer)) {
            result.extend(self.import_refs(reexport));
        }
        result
    }

    fn binding_refs(&mut self, binding: NodeId, env: EnvId) -> Vec<Config> {
        match self.scopes().symbol_at(binding) {
            Some(id) => self.declaration_refs(id, env),
            None => Vec::new(),
        }
    }

    /// One step of value flow from `node` evaluated under `env`.
    fn flows_to(&mut self, node: NodeId, env: EnvId) -> FlowResult<Vec<Config>> {
        let ast = self.ast();
        let mut result = Vec::new();

        if let NodeKind::Function {
            name: Some(name), ..
        } = *ast.kind(node)
        {
            let env = self.scope_env(node, env);
            result.extend(self.binding_refs(name, env));
        }

        let Some(parent) = ast.parent(node) else {
            return Ok(result);
        };
        match *ast.kind(parent) {
            NodeKind::Call { .. } | NodeKind::New { .. } if ast.callee_of(node).is_none() => {
                if let Some((_, position)) = ast.argument_of(node) {
                    self.argument_flows(parent, position, env, &mut result)?;
                }
            }
            NodeKind::Return { value: Some(value) } if value == node => {
                if let Some(function) = ast.enclosing_function(node) {
                    self.return_flows(function, env, &mut result)?;
                }
            }
            NodeKind::Function {
                body, flags, ..
            } if body == node && flags.expression_body => {
                let body_env = self.scope_env(parent, env);
                self.return_flows(parent, body_env, &mut result)?;
            }
            NodeKind::Declarator {
                target,
                init: Some(init),
            } if init == node => {
                if matches!(ast.kind(target), NodeKind::Binding { .. }) {
                    result.extend(self.binding_refs(target, env));
                }
            }
            NodeKind::Assign { target, value, .. } if value == node => {
                result.push(Config::new(parent, env));
                match *ast.kind(target) {
                    NodeKind::Identifier { .. } => {
                        if let Some(id) = self.scopes().symbol_at(target) {
                            let decl_env = self.scope_env(self.scopes().declaring_scope(id), env);
                            result.extend(self.declaration_refs(id, decl_env));
                        }
                    }
                    NodeKind::Member {
                        object, property, ..
                    } => {
                        let name = ast.name(property);
                        self.stored_property_flows(object, name, env, &mut result)?;
                    }
                    NodeKind::Index { object, index, .. } => {
                        if let NodeKind::Str { value } = *ast.kind(index) {
                            self.stored_property_flows(object, ast.name(value), env, &mut result)?;
                        }
                    }
                    _ => {}
                }
            }
            NodeKind::Property {
                key, value, ..
            } if value == node => {
                let Some(object) = ast.parent(parent) else {
                    return Ok(result);
                };
                if !matches!(ast.kind(object), NodeKind::Object { .. }) {
                    return Ok(result);
                }
                let name = match key {
                    PropKey::Named(key) => Some(ast.name(key)),
                    PropKey::Computed(key) => match *ast.kind(key) {
                        NodeKind::Str { value } => Some(ast.name(value)),
                        _ => None,
                    },
                };
                if let Some(name) = name {
                    let aliases = self.traced(Config::new(object, env))?;
                    self.property_reads(&aliases, name, &mut result)?;
                }
            }
            NodeKind::Array { ref elements } => {
                let Some(position) = literal_position(ast, elements, node) else {
                    return Ok(result);
                };
                let aliases = self.traced(Config::new(parent, env))?;
                self.element_reads(&aliases, position, &mut result);
            }
            NodeKind::Conditional { test, .. } if test != node => {
                result.push(Config::new(parent, env));
            }
            NodeKind::Logical { .. } | NodeKind::Await { .. } => {
                result.push(Config::new(parent, env));
            }
            NodeKind::Throw { value } if value == node => {
                if let Some(param) = self.enclosing_catch_param(parent) {
                    result.extend(self.binding_refs(param, env));
                }
            }
            NodeKind::ExportDefault { value } if value == node => {
                for &importer in self.scopes().importers(ImportTarget::Expression(node)) {
                    result.extend(self.import_refs(importer));
                }
            }
            _ => {}
        }
        Ok(result)
    }

    /// A value passed at `position` flows to the parameter of every user
    /// function the call may invoke, and the target of `Object.assign` flows
    /// to the call itself.
    fn argument_flows(
        &mut self,
        call: NodeId,
        position: usize,
        env: EnvId,
        result: &mut Vec<Config>,
    ) -> FlowResult<()> {
        let ast = self.ast();
        let Some((callee, _)) = ast.call_parts(call) else {
            return Ok(());
        };
        if position == 0 && self.is_object_assign(call, env)? {
            result.push(Config::new(call, env));
        }
        if !matches!(ast.kind(call), NodeKind::Call { .. }) {
            return Ok(());
        }
        for target in self.callee_targets(callee, env)? {
            let Target::Function(function) = target else {
                continue;
            };
            let Some(NodeKind::Function { params, .. }) = function.node().map(|f| ast.kind(f)) else {
                continue;
            };
            let Some(&param) = params.get(position) else {
                continue;
            };
            if !matches!(ast.kind(param), NodeKind::Binding { .. }) {
                continue;
            }
            let body_env = self.enter(function, call, env);
            result.extend(self.binding_refs(param, body_env));
        }
        Ok(())
    }

    /// A returned value flows to the calls of the function.
    fn return_flows(&mut self, function: NodeId, env: EnvId, result: &mut Vec<Config>) -> FlowResult<()> {
        let body_env = self.scope_env(function, env);
        let callers = self.callers(Config::new(function, body_env))?;
        result.extend(
            callers
                .iter()
                .filter(|caller| matches!(caller.cursor, Cursor::Syntax(_)))
                .copied()
                .sorted(),
        );
        Ok(())
    }

    /// A value stored into a property of the objects `object` evaluates to
    /// flows to the reads of that property.
    fn stored_property_flows(
        &mut self,
        object: NodeId,
        name: &str,
        env: EnvId,
        result: &mut Vec<Config>,
    ) -> FlowResult<()> {
        let ast = self.ast();
        let receivers = self.values(object, env)?;
        for receiver in receivers.iter().sorted() {
            let is_object = receiver
                .node()
                .is_some_and(|node| matches!(ast.kind(node), NodeKind::Object { .. }));
            if !is_object {
                continue;
            }
            let aliases = self.traced(*receiver)?;
            self.property_reads(&aliases, name, result)?;
        }
        Ok(())
    }

    /// The reads of the property `name` through any of the aliases, and the
    /// bindings of object patterns destructuring it.
    fn property_reads(&mut self, aliases: &ConfigSet, name: &str, result: &mut Vec<Config>) -> FlowResult<()> {
        let ast = self.ast();
        for alias in aliases.iter().sorted() {
            let Some(alias_node) = alias.node() else {
                continue;
            };
            let Some(parent) = ast.parent(alias_node) else {
                continue;
            };
            match *ast.kind(parent) {
                NodeKind::Member {
                    object, property, ..
                } if object == alias_node && ast.name(property) == name => {
                    if self.assigned_value(parent).is_none() {
                        result.push(Config::new(parent, alias.env));
                    }
                }
                NodeKind::Index { object, index, .. } if object == alias_node => {
                    let matches = matches!(*ast.kind(index), NodeKind::Str { value } if ast.name(value) == name);
                    if matches && self.assigned_value(parent).is_none() {
                        result.push(Config::new(parent, alias.env));
                    }
                }
                NodeKind::Declarator {
                    target,
                    init: Some(init),
                } if init == alias_node => {
                    let NodeKind::ObjectPattern { ref properties } = *ast.kind(target) else {
                        continue;
                    };
                    for &property in properties {
                        let NodeKind::Property {
                            key: PropKey::Named(key),
                            value,
                            ..
                        } = *ast.kind(property)
                        else {
                            continue;
                        };
                        if ast.name(key) == name && matches!(ast.kind(value), NodeKind::Binding { .. }) {
                            result.extend(self.binding_refs(value, alias.env));
                        }
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// The reads of the element at `position` through any of the aliases:
    /// literal indexing, `for ... of` loops and array patterns.
    fn element_reads(&mut self, aliases: &ConfigSet, position: u32, result: &mut Vec<Config>) {
        let ast = self.ast();
        for alias in aliases.iter().sorted() {
            let Some(alias_node) = alias.node() else {
                continue;
            };
            let Some(parent) = ast.parent(alias_node) else {
                continue;
            };
            match *ast.kind(parent) {
                NodeKind::Index { object, index, .. } if object == alias_node => {
                    let at = match *ast.kind(index) {
                        NodeKind::Number { text } => ast.name(text).parse::<u32>().ok(),
                        _ => None,
                    };
                    if at == Some(position) && self.assigned_value(parent).is_none() {
                        result.push(Config::new(parent, alias.env));
                    }
                }
                NodeKind::ForOf {
                    is_in: false,
                    head,
                    iterated,
                    ..
                } if iterated == alias_node => {
                    let NodeKind::VarDecl { ref declarators, .. } = *ast.kind(head) else {
                        continue;
                    };
                    for &declarator in declarators {
                        if let NodeKind::Declarator { target, .. } = *ast.kind(declarator) {
                            if matches!(ast.kind(target), NodeKind::Binding { .. }) {
                                result.extend(self.binding_refs(target, alias.env));
                            }
                        }
                    }
                }
                NodeKind::Declarator {
                    target,
                    init: Some(init),
                } if init == alias_node => {
                    let NodeKind::ArrayPattern { ref elements } = *ast.kind(target) else {
                        continue;
                    };
                    let element = elements.get(position as usize).copied().flatten();
                    if let Some(binding) = element {
                        if matches!(ast.kind(binding), NodeKind::Binding { .. }) {
                            result.extend(self.binding_refs(binding, alias.env));
                        }
                    }
                }
                _ => {}
            }
        }
    }

    /// The binding of the `catch` clause handling a `throw` statement of the
    /// same function.
    fn enclosing_catch_param(&self, throw: NodeId) -> Option<NodeId> {
        let ast = self.ast();
        let mut current = throw;
        while let Some(parent) = ast.parent(current) {
            match *ast.kind(parent) {
                NodeKind::Function { .. } => return None,
                NodeKind::Try {
                    block,
                    handler: Some(handler),
                    ..
                } if block == current => {
                    let NodeKind::Catch { param, .. } = *ast.kind(handler) else {
                        return None;
                    };
                    return param.filter(|&param| matches!(ast.kind(param), NodeKind::Binding { .. }));
                }
                _ => current = parent,
            }
        }
        None
    }
}

/// The position of `node` among the elements of an array literal, if no
/// spread precedes it.
fn literal_position(ast: &Ast, elements: &[Option<NodeId>], node: NodeId) -> Option<u32> {
    for (position, element) in elements.iter().enumerate() {
        match *element {
            Some(element) if element == node => return Some(position as u32),
            Some(element) if matches!(ast.kind(element), NodeKind::Spread { .. }) => return None,
            _ => {}
        }
    }
    None
}
