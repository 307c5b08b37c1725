use analysis::{contexts::EnvId, domains::JoinSemiLatticeNoContext};
use itertools::Itertools;
use rustc_hash::FxHashSet;

use super::{Demand, FlowResult, Site, Target, Visit};
use crate::{
    ast::{AssignOp, NodeId, NodeKind, PropKey, UnaryOp},
    builtins::{BuiltinId, Kind, Shape},
    cursor::{Config, ConfigSet, Cursor},
    scope::ImportTarget,
};

impl Demand<'_, '_, '_> {
    /// The right-hand side of `Evaluate`.
    pub(super) fn evaluate_config(&mut self, config: Config) -> FlowResult<ConfigSet> {
        match config.cursor {
            Cursor::External | Cursor::ArgumentList { .. } => Ok(ConfigSet::singleton(config)),
            Cursor::ElementPick {
                expression,
                position,
            } => {
                let arrays = self.values(expression, config.env)?;
                self.element_values(&arrays, position)
            }
            Cursor::Syntax(node) => self.evaluate_node(node, config.env),
        }
    }

    fn evaluate_node(&mut self, node: NodeId, env: EnvId) -> FlowResult<ConfigSet> {
        let ast = self.ast();
        let this = ConfigSet::singleton(Config::new(node, env));
        match *ast.kind(node) {
            NodeKind::Number { .. }
            | NodeKind::Str { .. }
            | NodeKind::Bool { .. }
            | NodeKind::Null
            | NodeKind::Undefined
            | NodeKind::Template { .. }
            | NodeKind::Function { .. }
            | NodeKind::Object { .. }
            | NodeKind::Array { .. }
            | NodeKind::Module { .. }
            | NodeKind::Update { .. } => Ok(this),
            NodeKind::Binary { op, .. } if op.is_bitwise() => {
                self.unsupported(node, "Bitwise operators are not modeled.");
                Ok(ConfigSet::default())
            }
            NodeKind::Binary { .. } => Ok(this),
            NodeKind::Unary {
                op: UnaryOp::BitNot,
                ..
            } => {
                self.unsupported(node, "Bitwise operators are not modeled.");
                Ok(ConfigSet::default())
            }
            NodeKind::Unary { .. } => Ok(this),
            NodeKind::Identifier { .. } | NodeKind::Binding { .. } => self.identifier_values(node, env),
            NodeKind::This => self.this_values(node, env),
            NodeKind::Call { .. } => self.call_values(node, env),
            NodeKind::New { callee, .. } => self.new_values(node, callee, env),
            NodeKind::Member {
                object, property, ..
            } => {
                let receivers = self.values(object, env)?;
                let name = ast.name(property);
                self.property_values(&receivers, name, Some(Site { node, env }))
            }
            NodeKind::Index { object, index, .. } => {
                let receivers = self.values(object, env)?;
                match ast.kind(index) {
                    NodeKind::Str { value } => {
                        let name = ast.name(*value);
                        self.property_values(&receivers, name, Some(Site { node, env }))
                    }
                    NodeKind::Number { text } => {
                        let position = ast.name(*text).parse::<u32>().ok();
                        self.element_values(&receivers, position)
                    }
                    _ => self.element_values(&receivers, None),
                }
            }
            NodeKind::Logical { lhs, rhs, .. } => {
                let mut result = self.values(lhs, env)?;
                result.join_assign_(&self.values(rhs, env)?);
                Ok(result)
            }
            NodeKind::Conditional { then, els, .. } => {
                let mut result = self.values(then, env)?;
                result.join_assign_(&self.values(els, env)?);
                Ok(result)
            }
            NodeKind::Assign { op, target, value } => match op {
                AssignOp::Assign => self.values(value, env),
                AssignOp::Logical(_) => {
                    let mut result = self.values(target, env)?;
                    result.join_assign_(&self.values(value, env)?);
                    Ok(result)
                }
                AssignOp::Arithmetic(op) if op.is_bitwise() => {
                    self.unsupported(node, "Bitwise operators are not modeled.");
                    Ok(ConfigSet::default())
                }
                AssignOp::Arithmetic(_) => Ok(this),
            },
            NodeKind::Await { argument } => {
                let promises = self.values(argument, env)?;
                self.await_values(&promises)
            }
            _ => {
                self.unsupported(node, "No rule to evaluate this expression.");
                Ok(ConfigSet::default())
            }
        }
    }

    fn identifier_values(&mut self, node: NodeId, env: EnvId) -> FlowResult<ConfigSet> {
        if self.scopes().symbol_at(node).is_some() {
            let origins = self.bind(Config::new(node, env))?;
            return self.evaluate_all(&origins);
        }
        if self.global_name(node).is_some() {
            return Ok(ConfigSet::singleton(Config::new(node, self.root())));
        }
        Ok(self.external_set())
    }

    /// The receivers of the calls of the nearest non-arrow function.
    fn this_values(&mut self, node: NodeId, env: EnvId) -> FlowResult<ConfigSet> {
        let ast = self.ast();
        let mut current = ast.enclosing_function(node);
        while let Some(function) = current {
            if !ast.function_flags(function).is_some_and(|flags| flags.is_arrow) {
                break;
            }
            current = ast.enclosing_function(function);
        }
        let Some(function) = current else {
            return Ok(self.external_set());
        };
        if self.is_target(function) {
            return Ok(self.external_set());
        }
        let body_env = self.scope_env(function, env);
        let callers = self.callers(Config::new(function, body_env))?;
        let mut result = ConfigSet::default();
        for caller in callers.iter().sorted() {
            let Some(call) = caller.node() else {
                continue;
            };
            if let Some(object) = self.receiver(call) {
                result.join_assign_(&self.values(object, caller.env)?);
            }
        }
        Ok(result)
    }

    fn call_values(&mut self, call: NodeId, env: EnvId) -> FlowResult<ConfigSet> {
        let Some((callee, _)) = self.ast().call_parts(call) else {
            return Ok(ConfigSet::default());
        };
        let mut result = ConfigSet::default();
        for target in self.callee_targets(callee, env)? {
            match target {
                Target::Function(function) => {
                    result.join_assign_(&self.apply(function, call, env)?);
                }
                Target::Builtin(id) => {
                    result.join_assign_(&self.call_builtin(id, Site { node: call, env })?);
                }
                Target::External => {
                    result.insert(self.external());
                }
            }
        }
        Ok(result)
    }

    /// The result of a builtin call. Without a summary, a call producing a
    /// known kind is its own constructor.
    pub(crate) fn call_builtin(&mut self, id: BuiltinId, site: Site) -> FlowResult<ConfigSet> {
        let entry = self.builtin_entry(id);
        match entry.call {
            Some(summary) => summary(self, site),
            None if entry.produces.is_some() => {
                Ok(ConfigSet::singleton(Config::new(site.node, site.env)))
            }
            None => Ok(self.external_set()),
        }
    }

    fn new_values(&mut self, new: NodeId, callee: NodeId, env: EnvId) -> FlowResult<ConfigSet> {
        if let Some(id) = self.constructor(new)? {
            return self.call_builtin(id, Site { node: new, env });
        }
        let callees = self.values(callee, env)?;
        let ast = self.ast();
        if callees
            .iter()
            .any(|value| value.node().is_some_and(|node| ast.is_function(node)))
        {
            self.unsupported(new, "Constructing user-defined functions is not modeled.");
            return Ok(ConfigSet::default());
        }
        Ok(self.external_set())
    }

    ////////////////
    //  Property  //
    ////////////////

    /// The values of the property `name` of each value. `site` is the access
    /// expression, if any: getters of builtins evaluate to it.
    pub fn property_values(
        &mut self,
        values: &ConfigSet,
        name: &str,
        site: Option<Site>,
    ) -> FlowResult<ConfigSet> {
        let mut result = ConfigSet::default();
        for value in values.iter().sorted() {
            let value = *value;
            let ast = self.ast();
            let found = match value.cursor {
                Cursor::External => self.external_set(),
                Cursor::Syntax(node) => match ast.kind(node) {
                    NodeKind::Object { .. } => self.guarded(
                        Visit::Property(value, name.to_owned()),
                        |demand| demand.object_property(value, name),
                    )?,
                    NodeKind::Module { .. } => self.export_values(node, name)?,
                    NodeKind::Null | NodeKind::Undefined => ConfigSet::default(),
                    _ => self.builtin_property(value, name, site)?,
                },
                _ => self.builtin_property(value, name, site)?,
            };
            result.join_assign_(&found);
        }
        Ok(result)
    }

    fn getter_value(&self, site: Option<Site>) -> ConfigSet {
        match site {
            Some(site) => ConfigSet::singleton(Config::new(site.node, site.env)),
            None => self.external_set(),
        }
    }

    fn builtin_property(
        &mut self,
        value: Config,
        name: &str,
        site: Option<Site>,
    ) -> FlowResult<ConfigSet> {
        let report_at = site.map_or(value.node(), |site| Some(site.node));

        if let Some(namespace) = value.node().and_then(|node| self.global_name(node)) {
            let found = match report_at {
                Some(node) => self.lookup(node, Shape::Static(namespace, name))?,
                None => None,
            };
            return match found {
                Some(id) if self.builtin_entry(id).getter => Ok(self.getter_value(site)),
                Some(_) => Ok(self.external_set()),
                None => {
                    if let Some(node) = report_at {
                        self.unsupported(node, format!("Unknown member '{namespace}.{name}'."));
                    }
                    Ok(ConfigSet::default())
                }
            };
        }

        if let Cursor::Syntax(node) = value.cursor {
            let mut handled = false;
            let mut result = ConfigSet::default();
            for id in self.builtins_at(node, value.env)? {
                if let Some(summary) = self.builtin_entry(id).property {
                    let producer = Site {
                        node,
                        env: value.env,
                    };
                    if let Some(values) = summary(self, producer, name)? {
                        result.join_assign_(&values);
                        handled = true;
                    }
                }
            }
            if handled {
                return Ok(result);
            }
        }

        let kinds = self.value_kinds(value)?;
        let mut result = ConfigSet::default();
        for kind in kinds {
            let Some(node) = report_at else {
                break;
            };
            match self.lookup(node, Shape::Method(kind, name))? {
                Some(id) if self.builtin_entry(id).getter => {
                    result.join_assign_(&self.getter_value(site));
                }
                Some(_) => {
                    result.insert(self.external());
                }
                None => self.unsupported(node, format!("Unknown property '{name}' of {kind}.")),
            }
        }
        Ok(result)
    }

    /// The values stored in the property `name` of an object literal: its
    /// own properties, spread objects, assignments through aliases and the
    /// sources of `Object.assign` calls targeting it.
    fn object_property(&mut self, object: Config, name: &str) -> FlowResult<ConfigSet> {
        let ast = self.ast();
        let Some(node) = object.node() else {
            return Ok(ConfigSet::default());
        };
        let NodeKind::Object { properties } = ast.kind(node) else {
            return Ok(ConfigSet::default());
        };
        let env = object.env;
        let mut result = ConfigSet::default();
        for &property in properties {
            match ast.kind(property) {
                NodeKind::Property {
                    key: PropKey::Named(key),
                    value,
                    ..
                } if ast.name(*key) == name => {
                    result.join_assign_(&self.values(*value, env)?);
                }
                NodeKind::Property {
                    key: PropKey::Computed(key),
                    value,
                    ..
                } if matches!(ast.kind(*key), NodeKind::Str { value: text } if ast.name(*text) == name) => {
                    result.join_assign_(&self.values(*value, env)?);
                }
                NodeKind::Spread { argument } => {
                    let spread = self.values(*argument, env)?;
                    result.join_assign_(&self.property_values(&spread, name, None)?);
                }
                _ => {}
            }
        }

        for alias in self.traced(object)?.iter().sorted() {
            let Some(alias_node) = alias.node() else {
                continue;
            };
            let Some(parent) = ast.parent(alias_node) else {
                continue;
            };
            let stored = match ast.kind(parent) {
                NodeKind::Member {
                    object, property, ..
                } if *object == alias_node && ast.name(*property) == name => self.assigned_value(parent),
                NodeKind::Index { object, index, .. }
                    if *object == alias_node
                        && matches!(ast.kind(*index), NodeKind::Str { value: text } if ast.name(*text) == name) =>
                {
                    self.assigned_value(parent)
                }
                _ => None,
            };
            if let Some(stored) = stored {
                result.join_assign_(&self.values(stored, alias.env)?);
            }
            if let Some(sources) = self.assign_sources(alias_node, alias.env)? {
                for source in sources {
                    let source_values = self.values(source, alias.env)?;
                    result.join_assign_(&self.property_values(&source_values, name, None)?);
                }
            }
        }
        Ok(result)
    }

    /// The value stored by an assignment whose target is `target`.
    pub(super) fn assigned_value(&self, target: NodeId) -> Option<NodeId> {
        let ast = self.ast();
        let parent = ast.parent(target)?;
        match ast.kind(parent) {
            NodeKind::Assign {
                op: AssignOp::Assign | AssignOp::Logical(_),
                target: assigned,
                value,
            } if *assigned == target => Some(*value),
            _ => None,
        }
    }

    /// The source arguments of an `Object.assign` call `node` is the target
    /// argument of.
    pub(super) fn assign_sources(&mut self, node: NodeId, env: EnvId) -> FlowResult<Option<Vec<NodeId>>> {
        let ast = self.ast();
        let Some((call, 0)) = ast.argument_of(node) else {
            return Ok(None);
        };
        if !self.is_object_assign(call, env)? {
            return Ok(None);
        }
        let arguments = ast.call_parts(call).map_or(&[][..], |(_, arguments)| arguments);
        Ok(Some(arguments[1..].to_vec()))
    }

    pub(super) fn is_object_assign(&mut self, call: NodeId, env: EnvId) -> FlowResult<bool> {
        let ast = self.ast();
        if !matches!(ast.kind(call), NodeKind::Call { .. }) {
            return Ok(false);
        }
        let Some((callee, _)) = ast.call_parts(call) else {
            return Ok(false);
        };
        let targets = self.callee_targets(callee, env)?;
        Ok(targets.into_iter().any(|target| match target {
            Target::Builtin(id) => self.builtin_entry(id).shape == Shape::Static("Object", "assign"),
            _ => false,
        }))
    }

    /// The export of a module namespace object.
    fn export_values(&mut self, module_root: NodeId, name: &str) -> FlowResult<ConfigSet> {
        let ast = self.ast();
        let module = ast.module_of(module_root);
        match self.scopes().export_of(ast, module, name) {
            ImportTarget::Decl(id) => {
                let binding = self.scopes().decl(id).binding;
                let env = self.top_level(binding);
                self.values(binding, env)
            }
            ImportTarget::Expression(value) => {
                let env = self.top_level(value);
                self.values(value, env)
            }
            ImportTarget::Namespace(other) => {
                let root = self.program().root(other);
                Ok(ConfigSet::singleton(Config::new(root, self.root())))
            }
            ImportTarget::External => Ok(self.external_set()),
        }
    }

    ///////////////
    //  Element  //
    ///////////////

    /// The elements at `position` of each value, any position for `None`.
    pub fn element_values(&mut self, values: &ConfigSet, position: Option<u32>) -> FlowResult<ConfigSet> {
        let mut result = ConfigSet::default();
        for value in values.iter().sorted() {
            let value = *value;
            let found = match value.cursor {
                Cursor::External => self.external_set(),
                Cursor::ArgumentList { call, position: from } => {
                    self.argument_elements(call, from, value.env, position)?
                }
                Cursor::ElementPick { .. } => ConfigSet::default(),
                Cursor::Syntax(node) => match self.ast().kind(node) {
                    NodeKind::Array { .. } => self.guarded(
                        Visit::Elements(value, position),
                        |demand| demand.array_elements(value, position),
                    )?,
                    NodeKind::Object { .. } => match position {
                        Some(position) => self.guarded(
                            Visit::Property(value, position.to_string()),
                            |demand| demand.object_property(value, &position.to_string()),
                        )?,
                        None => self.object_values(value)?,
                    },
                    NodeKind::Str { .. } | NodeKind::Template { .. } => self.external_set(),
                    NodeKind::Null | NodeKind::Undefined => ConfigSet::default(),
                    _ => self.builtin_elements(value, node, position)?,
                },
            };
            result.join_assign_(&found);
        }
        Ok(result)
    }

    /// The arguments of `call` from `from` onward, seen as an array.
    fn argument_elements(
        &mut self,
        call: NodeId,
        from: u32,
        env: EnvId,
        position: Option<u32>,
    ) -> FlowResult<ConfigSet> {
        let ast = self.ast();
        let arguments = ast.call_parts(call).map_or(&[][..], |(_, arguments)| arguments);
        let rest = arguments.get(from as usize..).unwrap_or_default();
        let mut result = ConfigSet::default();
        let mut offset = Some(0u32);
        for &argument in rest {
            if let NodeKind::Spread { argument } = ast.kind(argument) {
                let spread = self.values(*argument, env)?;
                result.join_assign_(&self.element_values(&spread, None)?);
                offset = None;
                continue;
            }
            if position.is_none() || offset.is_none() || position == offset {
                result.join_assign_(&self.values(argument, env)?);
            }
            offset = offset.map(|offset| offset + 1);
        }
        Ok(result)
    }

    /// The elements of an array literal together with the values pushed or
    /// stored into it through its aliases.
    fn array_elements(&mut self, array: Config, position: Option<u32>) -> FlowResult<ConfigSet> {
        let ast = self.ast();
        let Some(node) = array.node() else {
            return Ok(ConfigSet::default());
        };
        let NodeKind::Array { elements } = ast.kind(node) else {
            return Ok(ConfigSet::default());
        };
        let env = array.env;
        let mut result = ConfigSet::default();
        let mut offset = Some(0u32);
        for element in elements {
            match element.map(|element| (element, ast.kind(element))) {
                None => {}
                Some((_, NodeKind::Spread { argument })) => {
                    let reaches = match (position, offset) {
                        (Some(position), Some(offset)) => offset <= position,
                        _ => true,
                    };
                    if reaches {
                        let spread = self.values(*argument, env)?;
                        result.join_assign_(&self.element_values(&spread, None)?);
                    }
                    offset = None;
                    continue;
                }
                Some((element, _)) => {
                    if position.is_none() || offset.is_none() || position == offset {
                        result.join_assign_(&self.values(element, env)?);
                    }
                }
            }
            offset = offset.map(|offset| offset + 1);
        }

        for alias in self.traced(array)?.iter().sorted() {
            let Some(alias_node) = alias.node() else {
                continue;
            };
            let Some(parent) = ast.parent(alias_node) else {
                continue;
            };
            match *ast.kind(parent) {
                NodeKind::Member {
                    object, property, ..
                } if object == alias_node && matches!(ast.name(property), "push" | "unshift") => {
                    let Some(call) = ast.callee_of(parent) else {
                        continue;
                    };
                    let pushed = self.argument_elements(call, 0, alias.env, None)?;
                    result.join_assign_(&pushed);
                }
                NodeKind::Index { object, index, .. } if object == alias_node => {
                    let Some(stored) = self.assigned_value(parent) else {
                        continue;
                    };
                    let stored_at = match ast.kind(index) {
                        NodeKind::Number { text } => ast.name(*text).parse::<u32>().ok(),
                        _ => None,
                    };
                    if position.is_none() || stored_at.is_none() || position == stored_at {
                        result.join_assign_(&self.values(stored, alias.env)?);
                    }
                }
                _ => {}
            }
        }
        Ok(result)
    }

    /// The values of all the own properties of an object literal.
    fn object_values(&mut self, object: Config) -> FlowResult<ConfigSet> {
        let ast = self.ast();
        let Some(NodeKind::Object { properties }) = object.node().map(|node| ast.kind(node)) else {
            return Ok(ConfigSet::default());
        };
        let mut result = ConfigSet::default();
        for &property in properties {
            if let NodeKind::Property { value, .. } = ast.kind(property) {
                result.join_assign_(&self.values(*value, object.env)?);
            }
        }
        Ok(result)
    }

    fn builtin_elements(&mut self, value: Config, node: NodeId, position: Option<u32>) -> FlowResult<ConfigSet> {
        let mut handled = false;
        let mut result = ConfigSet::default();
        for id in self.builtins_at(node, value.env)? {
            if let Some(summary) = self.builtin_entry(id).element {
                let producer = Site {
                    node,
                    env: value.env,
                };
                if let Some(values) = summary(self, producer, position)? {
                    result.join_assign_(&values);
                    handled = true;
                }
            }
        }
        if handled {
            return Ok(result);
        }
        if self.value_kinds(value)?.is_empty() {
            self.unsupported(node, "Value has no elements.");
            return Ok(ConfigSet::default());
        }
        Ok(self.external_set())
    }

    /////////////
    //  Await  //
    /////////////

    /// Unwraps promises: calls of `async` functions resolve to what the
    /// function returns, builtin promises to their resolved summary. Other
    /// values are awaited as is.
    pub fn await_values(&mut self, values: &ConfigSet) -> FlowResult<ConfigSet> {
        let mut worklist: Vec<Config> = values.iter().copied().sorted().rev().collect();
        let mut visited = FxHashSet::default();
        let mut result = ConfigSet::default();
        while let Some(value) = worklist.pop() {
            if !visited.insert(value) {
                continue;
            }
            let Some(node) = value.node() else {
                result.insert(value);
                continue;
            };
            let ast = self.ast();
            let mut promise = false;
            let mut resolved = ConfigSet::default();
            match ast.kind(node) {
                NodeKind::Call { callee, .. } => {
                    for target in self.callee_targets(*callee, value.env)? {
                        match target {
                            Target::Function(function) => {
                                let Some(function_node) = function.node() else {
                                    continue;
                                };
                                if !ast.function_flags(function_node).is_some_and(|flags| flags.is_async) {
                                    continue;
                                }
                                promise = true;
                                let body_env = self.enter(function, node, value.env);
                                resolved.join_assign_(&self.returns(function_node, body_env)?);
                            }
                            Target::Builtin(id) => {
                                promise |= self.builtin_resolved(id, node, value.env, &mut resolved)?;
                            }
                            Target::External => {}
                        }
                    }
                }
                NodeKind::New { .. } => {
                    if let Some(id) = self.constructor(node)? {
                        promise |= self.builtin_resolved(id, node, value.env, &mut resolved)?;
                    }
                }
                _ => {}
            }
            if promise {
                // A promise resolving to itself stands for its settled value.
                if resolved.remove(&value) {
                    result.insert(value);
                }
                worklist.extend(resolved.iter().copied().sorted().rev());
            } else {
                result.insert(value);
            }
        }
        Ok(result)
    }

    /// Collects what a builtin promise resolves to. Returns whether the
    /// builtin produces promises at all.
    fn builtin_resolved(
        &mut self,
        id: BuiltinId,
        node: NodeId,
        env: EnvId,
        resolved: &mut ConfigSet,
    ) -> FlowResult<bool> {
        let entry = self.builtin_entry(id);
        match entry.resolved {
            Some(summary) => {
                resolved.join_assign_(&summary(self, Site { node, env })?);
                Ok(true)
            }
            None if entry.produces == Some(Kind::Promise) => {
                resolved.insert(self.external());
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
