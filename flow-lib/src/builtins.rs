//! Summaries of the standard library. Every entry describes one callable or
//! readable shape, e.g., `JSON.parse` or `Array#map`, by the functions the
//! analysis calls instead of analyzing its code.
//!
//! A value produced by a builtin is represented by the call or `new`
//! expression producing it. The entries of such a value are recovered by
//! matching that expression against the catalogue again, so the property,
//! element and promise summaries of an entry describe the values it
//! produces.

use core::fmt::Display;

use analysis::domains::JoinSemiLatticeNoContext;
use itertools::Itertools;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::{
    ast::NodeKind,
    cursor::{Config, ConfigSet, Cursor},
    flow::{Demand, FlowResult, Site},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BuiltinId(u32);

/// The types of values builtin methods are looked up on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Kind {
    Array,
    String,
    Number,
    Boolean,
    Object,
    Function,
    Promise,
    Map,
    Set,
    Date,
    Error,
    RegExp,
    /// A global object only used as a namespace, like `JSON`.
    Namespace,
}

impl Display for Kind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Kind::Array => "Array",
            Kind::String => "String",
            Kind::Number => "Number",
            Kind::Boolean => "Boolean",
            Kind::Object => "Object",
            Kind::Function => "Function",
            Kind::Promise => "Promise",
            Kind::Map => "Map",
            Kind::Set => "Set",
            Kind::Date => "Date",
            Kind::Error => "Error",
            Kind::RegExp => "RegExp",
            Kind::Namespace => "Namespace",
        };
        f.write_str(name)
    }
}

/// How a builtin is reached from the code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Shape<'a> {
    /// A global function, `parseInt(s)`.
    Global(&'a str),
    /// A member of a global namespace, `JSON.parse(s)`. The name `*` matches
    /// every member of the namespace.
    Static(&'a str, &'a str),
    /// A global constructor, `new Map()`.
    Constructor(&'a str),
    /// A method or getter of a kind of value, `[].map(f)`.
    Method(Kind, &'a str),
}

impl<'a> Shape<'a> {
    fn name(&self) -> &'a str {
        match *self {
            Shape::Global(name)
            | Shape::Static(_, name)
            | Shape::Constructor(name)
            | Shape::Method(_, name) => name,
        }
    }
}

impl Display for Shape<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Shape::Global(name) => write!(f, "{name}"),
            Shape::Static(namespace, name) => write!(f, "{namespace}.{name}"),
            Shape::Constructor(name) => write!(f, "new {name}"),
            Shape::Method(kind, name) => write!(f, "{kind}#{name}"),
        }
    }
}

/// The result of calling the builtin at `site`.
pub type CallSummary = fn(&mut Demand<'_, '_, '_>, Site) -> FlowResult<ConfigSet>;
/// A named property of the value produced at `site`. `None` defers to the
/// methods of the kind of the value.
pub type PropertySummary = fn(&mut Demand<'_, '_, '_>, Site, &str) -> FlowResult<Option<ConfigSet>>;
/// An element of the value produced at `site`, any element for `None`.
pub type ElementSummary =
    fn(&mut Demand<'_, '_, '_>, Site, Option<u32>) -> FlowResult<Option<ConfigSet>>;
/// What the promise produced at `site` resolves to.
pub type ResolvedSummary = fn(&mut Demand<'_, '_, '_>, Site) -> FlowResult<ConfigSet>;
/// The values the builtin called at `site` passes to the parameter `param`
/// of the callback argument at position `callback`.
pub type BinderSummary = fn(&mut Demand<'_, '_, '_>, Site, u32, u32) -> FlowResult<ConfigSet>;

#[derive(Clone, Copy)]
pub struct Entry {
    pub shape: Shape<'static>,
    /// The kind of the values the builtin returns, if it constructs one.
    pub produces: Option<Kind>,
    /// Read as a property rather than called.
    pub getter: bool,
    pub call: Option<CallSummary>,
    pub property: Option<PropertySummary>,
    pub element: Option<ElementSummary>,
    pub resolved: Option<ResolvedSummary>,
    pub binder: Option<BinderSummary>,
}

impl core::fmt::Debug for Entry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Entry")
            .field("shape", &self.shape)
            .field("produces", &self.produces)
            .field("getter", &self.getter)
            .finish_non_exhaustive()
    }
}

impl Entry {
    pub fn new(shape: Shape<'static>) -> Self {
        Self {
            shape,
            produces: None,
            getter: false,
            call: None,
            property: None,
            element: None,
            resolved: None,
            binder: None,
        }
    }

    pub fn produces(mut self, kind: Kind) -> Self {
        self.produces = Some(kind);
        self
    }

    pub fn getter(mut self) -> Self {
        self.getter = true;
        self
    }

    pub fn call(mut self, summary: CallSummary) -> Self {
        self.call = Some(summary);
        self
    }

    pub fn property(mut self, summary: PropertySummary) -> Self {
        self.property = Some(summary);
        self
    }

    pub fn element(mut self, summary: ElementSummary) -> Self {
        self.element = Some(summary);
        self
    }

    pub fn resolved(mut self, summary: ResolvedSummary) -> Self {
        self.resolved = Some(summary);
        self
    }

    pub fn binder(mut self, summary: BinderSummary) -> Self {
        self.binder = Some(summary);
        self
    }
}

/// The table of builtins, indexed by the last name of their shapes.
#[derive(Clone, Debug)]
pub struct Catalogue {
    entries: Vec<Entry>,
    by_name: FxHashMap<&'static str, Vec<BuiltinId>>,
    globals: FxHashSet<&'static str>,
    namespaces: FxHashSet<&'static str>,
}

impl Default for Catalogue {
    fn default() -> Self {
        Self::standard()
    }
}

impl Catalogue {
    pub fn standard() -> Self {
        Self::from_entries(standard_entries())
    }

    pub fn from_entries(entries: Vec<Entry>) -> Self {
        let mut by_name: FxHashMap<&'static str, Vec<BuiltinId>> = FxHashMap::default();
        let mut globals = FxHashSet::default();
        let mut namespaces = FxHashSet::default();
        for (idx, entry) in entries.iter().enumerate() {
            by_name
                .entry(entry.shape.name())
                .or_default()
                .push(BuiltinId(idx as u32));
            match entry.shape {
                Shape::Global(name) | Shape::Constructor(name) => {
                    globals.insert(name);
                }
                Shape::Static(namespace, _) => {
                    globals.insert(namespace);
                    namespaces.insert(namespace);
                }
                Shape::Method(..) => {}
            }
        }
        Self {
            entries,
            by_name,
            globals,
            namespaces,
        }
    }

    pub fn entry(&self, id: BuiltinId) -> &Entry {
        &self.entries[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every entry matching the shape. A namespace member without an entry
    /// of its own falls back to the `*` entry of the namespace.
    pub fn lookup(&self, shape: Shape<'_>) -> Vec<BuiltinId> {
        let found = self.matching(shape);
        match shape {
            Shape::Static(namespace, name) if found.is_empty() && name != "*" => {
                self.matching(Shape::Static(namespace, "*"))
            }
            _ => found,
        }
    }

    fn matching(&self, shape: Shape<'_>) -> Vec<BuiltinId> {
        self.by_name
            .get(shape.name())
            .map(|ids| {
                ids.iter()
                    .copied()
                    .filter(|&id| self.entry(id).shape == shape)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn lookup_global(&self, name: &str) -> Vec<BuiltinId> {
        self.lookup(Shape::Global(name))
    }

    pub fn lookup_static(&self, namespace: &str, name: &str) -> Vec<BuiltinId> {
        self.lookup(Shape::Static(namespace, name))
    }

    pub fn lookup_constructor(&self, name: &str) -> Vec<BuiltinId> {
        self.lookup(Shape::Constructor(name))
    }

    pub fn lookup_method(&self, kind: Kind, name: &str) -> Vec<BuiltinId> {
        self.lookup(Shape::Method(kind, name))
    }

    /// Whether an undeclared identifier names a builtin.
    pub fn is_global(&self, name: &str) -> bool {
        self.globals.contains(name)
    }

    pub fn is_namespace(&self, name: &str) -> bool {
        self.namespaces.contains(name)
    }
}

///////////////
//  Helpers  //
///////////////

fn nothing(_: &mut Demand<'_, '_, '_>, _: Site) -> FlowResult<ConfigSet> {
    Ok(ConfigSet::default())
}

fn external(d: &mut Demand<'_, '_, '_>, _: Site) -> FlowResult<ConfigSet> {
    Ok(d.external_set())
}

fn external_binding(d: &mut Demand<'_, '_, '_>, _: Site, _: u32, _: u32) -> FlowResult<ConfigSet> {
    Ok(d.external_set())
}

fn external_elements(d: &mut Demand<'_, '_, '_>, _: Site, _: Option<u32>) -> FlowResult<Option<ConfigSet>> {
    Ok(Some(d.external_set()))
}

/// The values of the object a method is called on.
fn receiver_values(d: &mut Demand<'_, '_, '_>, site: Site) -> FlowResult<ConfigSet> {
    match d.receiver(site.node) {
        Some(object) => d.values(object, site.env),
        None => Ok(ConfigSet::default()),
    }
}

fn receiver(d: &mut Demand<'_, '_, '_>, site: Site) -> FlowResult<ConfigSet> {
    receiver_values(d, site)
}

fn receiver_elements(d: &mut Demand<'_, '_, '_>, site: Site) -> FlowResult<ConfigSet> {
    let receivers = receiver_values(d, site)?;
    d.element_values(&receivers, None)
}

fn argument_values(d: &mut Demand<'_, '_, '_>, site: Site, position: usize) -> FlowResult<ConfigSet> {
    let Some(argument) = d.argument(site.node, position) else {
        return Ok(ConfigSet::default());
    };
    if let NodeKind::Spread { argument } = *d.ast().kind(argument) {
        let spread = d.values(argument, site.env)?;
        return d.element_values(&spread, None);
    }
    d.values(argument, site.env)
}

fn first_argument(d: &mut Demand<'_, '_, '_>, site: Site) -> FlowResult<ConfigSet> {
    argument_values(d, site, 0)
}

/// What the callback at `position` returns when the builtin calls it.
fn callback_returns(d: &mut Demand<'_, '_, '_>, site: Site, position: u32) -> FlowResult<ConfigSet> {
    let callbacks = argument_values(d, site, position as usize)?;
    let mut result = ConfigSet::default();
    for callback in callbacks.iter().sorted() {
        match callback.cursor {
            Cursor::Syntax(node) if d.ast().is_function(node) => {
                result.join_assign_(&d.apply_callback(*callback, site.node, position, site.env)?);
            }
            Cursor::External => {
                result.insert(d.external());
            }
            _ => {}
        }
    }
    Ok(result)
}

/// Elements of `values`, or the values themselves when they are not arrays.
fn flatten(d: &mut Demand<'_, '_, '_>, values: &ConfigSet) -> FlowResult<ConfigSet> {
    let mut result = ConfigSet::default();
    for value in values.iter().sorted() {
        let is_array = match value.cursor {
            Cursor::ArgumentList { .. } => true,
            Cursor::Syntax(node) => {
                matches!(d.ast().kind(node), NodeKind::Array { .. })
                    || d.value_kinds(*value)?.contains(&Kind::Array)
            }
            _ => false,
        };
        if is_array {
            result.join_assign_(&d.element_values(&ConfigSet::singleton(*value), None)?);
        } else {
            result.insert(*value);
        }
    }
    Ok(result)
}

/////////////
//  Array  //
/////////////

/// The callbacks of `map`, `forEach` and friends receive an element, its
/// index and the array.
fn iteration_binding(d: &mut Demand<'_, '_, '_>, site: Site, callback: u32, param: u32) -> FlowResult<ConfigSet> {
    match (callback, param) {
        (0, 0) => receiver_elements(d, site),
        (0, 2) => receiver_values(d, site),
        _ => Ok(d.external_set()),
    }
}

fn map_elements(d: &mut Demand<'_, '_, '_>, site: Site, _: Option<u32>) -> FlowResult<Option<ConfigSet>> {
    callback_returns(d, site, 0).map(Some)
}

fn receiver_element_summary(
    d: &mut Demand<'_, '_, '_>,
    site: Site,
    _: Option<u32>,
) -> FlowResult<Option<ConfigSet>> {
    receiver_elements(d, site).map(Some)
}

fn find(d: &mut Demand<'_, '_, '_>, site: Site) -> FlowResult<ConfigSet> {
    receiver_elements(d, site)
}

fn reduce(d: &mut Demand<'_, '_, '_>, site: Site) -> FlowResult<ConfigSet> {
    let mut result = callback_returns(d, site, 0)?;
    result.join_assign_(&argument_values(d, site, 1)?);
    Ok(result)
}

fn reduce_binding(d: &mut Demand<'_, '_, '_>, site: Site, callback: u32, param: u32) -> FlowResult<ConfigSet> {
    match (callback, param) {
        (0, 0) => {
            let mut result = argument_values(d, site, 1)?;
            result.join_assign_(&callback_returns(d, site, 0)?);
            if d.argument(site.node, 1).is_none() {
                result.join_assign_(&receiver_elements(d, site)?);
            }
            Ok(result)
        }
        (0, 1) => receiver_elements(d, site),
        (0, 3) => receiver_values(d, site),
        _ => Ok(d.external_set()),
    }
}

fn sort_binding(d: &mut Demand<'_, '_, '_>, site: Site, _: u32, _: u32) -> FlowResult<ConfigSet> {
    receiver_elements(d, site)
}

fn concat_elements(d: &mut Demand<'_, '_, '_>, site: Site, _: Option<u32>) -> FlowResult<Option<ConfigSet>> {
    let mut result = receiver_elements(d, site)?;
    let arguments = d
        .ast()
        .call_parts(site.node)
        .map_or(0, |(_, arguments)| arguments.len());
    for position in 0..arguments {
        let values = argument_values(d, site, position)?;
        result.join_assign_(&flatten(d, &values)?);
    }
    Ok(Some(result))
}

fn flat_elements(d: &mut Demand<'_, '_, '_>, site: Site, _: Option<u32>) -> FlowResult<Option<ConfigSet>> {
    let elements = receiver_elements(d, site)?;
    flatten(d, &elements).map(Some)
}

fn array_from_elements(
    d: &mut Demand<'_, '_, '_>,
    site: Site,
    _: Option<u32>,
) -> FlowResult<Option<ConfigSet>> {
    if d.argument(site.node, 1).is_some() {
        return callback_returns(d, site, 1).map(Some);
    }
    let sources = first_argument(d, site)?;
    d.element_values(&sources, None).map(Some)
}

fn array_from_binding(d: &mut Demand<'_, '_, '_>, site: Site, callback: u32, param: u32) -> FlowResult<ConfigSet> {
    match (callback, param) {
        (1, 0) => {
            let sources = first_argument(d, site)?;
            d.element_values(&sources, None)
        }
        _ => Ok(d.external_set()),
    }
}

fn array_of_elements(
    d: &mut Demand<'_, '_, '_>,
    site: Site,
    position: Option<u32>,
) -> FlowResult<Option<ConfigSet>> {
    let arguments = ConfigSet::singleton(Config::new(
        Cursor::ArgumentList {
            call: site.node,
            position: 0,
        },
        site.env,
    ));
    d.element_values(&arguments, position).map(Some)
}

//////////////
//  Object  //
//////////////

fn object_values(d: &mut Demand<'_, '_, '_>, site: Site, _: Option<u32>) -> FlowResult<Option<ConfigSet>> {
    let objects = first_argument(d, site)?;
    d.element_values(&objects, None).map(Some)
}

///////////////
//  Promise  //
///////////////

fn resolve_argument(d: &mut Demand<'_, '_, '_>, site: Site) -> FlowResult<ConfigSet> {
    first_argument(d, site)
}

/// `Promise.all` settles to an array of the settled elements.
fn settles_to_itself(_: &mut Demand<'_, '_, '_>, site: Site) -> FlowResult<ConfigSet> {
    Ok(ConfigSet::singleton(Config::new(site.node, site.env)))
}

fn all_elements(d: &mut Demand<'_, '_, '_>, site: Site, position: Option<u32>) -> FlowResult<Option<ConfigSet>> {
    let promises = first_argument(d, site)?;
    let elements = d.element_values(&promises, position)?;
    d.await_values(&elements).map(Some)
}

fn race(d: &mut Demand<'_, '_, '_>, site: Site) -> FlowResult<ConfigSet> {
    let promises = first_argument(d, site)?;
    d.element_values(&promises, None)
}

/// `new Promise(executor)` resolves to the arguments the executor passes to
/// its `resolve` parameter.
fn executor_resolved(d: &mut Demand<'_, '_, '_>, site: Site) -> FlowResult<ConfigSet> {
    let executors = first_argument(d, site)?;
    let ast = d.ast();
    let mut result = ConfigSet::default();
    for executor in executors.iter().sorted() {
        let Some(NodeKind::Function { params, .. }) = executor.node().map(|node| ast.kind(node)) else {
            result.insert(d.external());
            continue;
        };
        let Some(&resolve) = params.first() else {
            continue;
        };
        let Some(id) = d.scopes().symbol_at(resolve) else {
            continue;
        };
        let body_env = d.enter_callback(*executor, site.node, 0, site.env);
        for &reference in d.scopes().find_references(id) {
            let env = d.env_at(reference, body_env);
            match ast.callee_of(reference) {
                Some(call) => {
                    if let Some(value) = d.argument(call, 0) {
                        result.join_assign_(&d.values(value, env)?);
                    }
                }
                None => {
                    result.insert(d.external());
                }
            }
        }
    }
    Ok(result)
}

fn then_resolved(d: &mut Demand<'_, '_, '_>, site: Site) -> FlowResult<ConfigSet> {
    if d.argument(site.node, 0).is_none() {
        let promises = receiver_values(d, site)?;
        return d.await_values(&promises);
    }
    callback_returns(d, site, 0)
}

fn then_binding(d: &mut Demand<'_, '_, '_>, site: Site, callback: u32, param: u32) -> FlowResult<ConfigSet> {
    match (callback, param) {
        (0, 0) => {
            let promises = receiver_values(d, site)?;
            d.await_values(&promises)
        }
        _ => Ok(d.external_set()),
    }
}

fn catch_resolved(d: &mut Demand<'_, '_, '_>, site: Site) -> FlowResult<ConfigSet> {
    let promises = receiver_values(d, site)?;
    let mut result = d.await_values(&promises)?;
    result.join_assign_(&callback_returns(d, site, 0)?);
    Ok(result)
}

fn finally_resolved(d: &mut Demand<'_, '_, '_>, site: Site) -> FlowResult<ConfigSet> {
    let promises = receiver_values(d, site)?;
    d.await_values(&promises)
}

///////////////////
//  Map and Set  //
///////////////////

/// The arguments at `position` of the calls of `method` on any alias of the
/// collections the receiver evaluates to.
fn stored_arguments(
    d: &mut Demand<'_, '_, '_>,
    collections: &ConfigSet,
    method: &str,
    position: usize,
) -> FlowResult<ConfigSet> {
    let ast = d.ast();
    let mut result = ConfigSet::default();
    for collection in collections.iter().sorted() {
        if collection.is_external() {
            result.insert(d.external());
            continue;
        }
        for alias in d.traced(*collection)?.iter().sorted() {
            let Some(alias_node) = alias.node() else {
                continue;
            };
            let Some(parent) = ast.parent(alias_node) else {
                continue;
            };
            let NodeKind::Member {
                object, property, ..
            } = *ast.kind(parent)
            else {
                continue;
            };
            if object != alias_node || ast.name(property) != method {
                continue;
            }
            let Some(call) = ast.callee_of(parent) else {
                continue;
            };
            if let Some(argument) = d.argument(call, position) {
                result.join_assign_(&d.values(argument, alias.env)?);
            }
        }
    }
    Ok(result)
}

/// The entries a collection was constructed with, e.g., `new Map([[k, v]])`.
fn initial_entries(d: &mut Demand<'_, '_, '_>, collections: &ConfigSet) -> FlowResult<ConfigSet> {
    let ast = d.ast();
    let mut result = ConfigSet::default();
    for collection in collections.iter().sorted() {
        let Some(node) = collection.node() else {
            continue;
        };
        if !matches!(ast.kind(node), NodeKind::New { .. }) {
            continue;
        }
        let site = Site {
            node,
            env: collection.env,
        };
        let sources = first_argument(d, site)?;
        result.join_assign_(&d.element_values(&sources, None)?);
    }
    Ok(result)
}

fn map_values(d: &mut Demand<'_, '_, '_>, maps: &ConfigSet) -> FlowResult<ConfigSet> {
    let mut result = stored_arguments(d, maps, "set", 1)?;
    let entries = initial_entries(d, maps)?;
    result.join_assign_(&d.element_values(&entries, Some(1))?);
    Ok(result)
}

fn map_get(d: &mut Demand<'_, '_, '_>, site: Site) -> FlowResult<ConfigSet> {
    let maps = receiver_values(d, site)?;
    map_values(d, &maps)
}

fn map_value_elements(
    d: &mut Demand<'_, '_, '_>,
    site: Site,
    _: Option<u32>,
) -> FlowResult<Option<ConfigSet>> {
    let maps = receiver_values(d, site)?;
    map_values(d, &maps).map(Some)
}

fn map_binding(d: &mut Demand<'_, '_, '_>, site: Site, callback: u32, param: u32) -> FlowResult<ConfigSet> {
    match (callback, param) {
        (0, 0) => {
            let maps = receiver_values(d, site)?;
            map_values(d, &maps)
        }
        (0, 2) => receiver_values(d, site),
        _ => Ok(d.external_set()),
    }
}

fn set_values(d: &mut Demand<'_, '_, '_>, sets: &ConfigSet) -> FlowResult<ConfigSet> {
    let mut result = stored_arguments(d, sets, "add", 0)?;
    result.join_assign_(&initial_entries(d, sets)?);
    Ok(result)
}

fn set_binding(d: &mut Demand<'_, '_, '_>, site: Site, callback: u32, param: u32) -> FlowResult<ConfigSet> {
    match (callback, param) {
        (0, 0 | 1) => {
            let sets = receiver_values(d, site)?;
            set_values(d, &sets)
        }
        (0, 2) => receiver_values(d, site),
        _ => Ok(d.external_set()),
    }
}

/////////////
//  Error  //
/////////////

fn error_property(d: &mut Demand<'_, '_, '_>, site: Site, name: &str) -> FlowResult<Option<ConfigSet>> {
    if name != "message" {
        return Ok(None);
    }
    first_argument(d, site).map(Some)
}

fn method(kind: Kind, name: &'static str) -> Entry {
    Entry::new(Shape::Method(kind, name))
}

fn methods<'a>(kind: Kind, names: &'a [&'static str], produces: Kind) -> impl Iterator<Item = Entry> + 'a {
    names
        .iter()
        .map(move |&name| method(kind, name).produces(produces))
}

/// The builtins known to the analysis.
pub fn standard_entries() -> Vec<Entry> {
    use Kind::*;
    let mut entries = vec![
        // Array
        method(Array, "map")
            .produces(Array)
            .element(map_elements)
            .binder(iteration_binding),
        method(Array, "filter")
            .produces(Array)
            .element(receiver_element_summary)
            .binder(iteration_binding),
        method(Array, "forEach").call(nothing).binder(iteration_binding),
        method(Array, "find").call(find).binder(iteration_binding),
        method(Array, "some").produces(Boolean).binder(iteration_binding),
        method(Array, "every").produces(Boolean).binder(iteration_binding),
        method(Array, "reduce").call(reduce).binder(reduce_binding),
        method(Array, "concat").produces(Array).element(concat_elements),
        method(Array, "slice").produces(Array).element(receiver_element_summary),
        method(Array, "flat").produces(Array).element(flat_elements),
        method(Array, "join").produces(String),
        method(Array, "includes").produces(Boolean),
        method(Array, "indexOf").produces(Number),
        method(Array, "push").produces(Number),
        method(Array, "pop").call(find),
        method(Array, "shift").call(find),
        method(Array, "sort").call(receiver).binder(sort_binding),
        method(Array, "reverse").call(receiver),
        method(Array, "keys").produces(Array).element(external_elements),
        method(Array, "values").produces(Array).element(receiver_element_summary),
        method(Array, "entries").produces(Array).element(external_elements),
        method(Array, "length").produces(Number).getter(),
        Entry::new(Shape::Static("Array", "from"))
            .produces(Array)
            .element(array_from_elements)
            .binder(array_from_binding),
        Entry::new(Shape::Static("Array", "isArray")).produces(Boolean),
        Entry::new(Shape::Static("Array", "of"))
            .produces(Array)
            .element(array_of_elements),
        // String
        method(String, "split").produces(Array).element(external_elements),
        method(String, "replace")
            .produces(String)
            .binder(external_binding),
        method(String, "length").produces(Number).getter(),
        // Object
        Entry::new(Shape::Static("Object", "keys"))
            .produces(Array)
            .element(external_elements),
        Entry::new(Shape::Static("Object", "values"))
            .produces(Array)
            .element(object_values),
        Entry::new(Shape::Static("Object", "entries"))
            .produces(Array)
            .element(external_elements),
        Entry::new(Shape::Static("Object", "assign")).call(first_argument),
        Entry::new(Shape::Static("Object", "freeze")).call(first_argument),
        method(Object, "hasOwnProperty").produces(Boolean),
        // JSON
        Entry::new(Shape::Static("JSON", "parse")).call(external),
        Entry::new(Shape::Static("JSON", "stringify")).produces(String),
        // Promise
        Entry::new(Shape::Static("Promise", "resolve"))
            .produces(Promise)
            .resolved(resolve_argument),
        Entry::new(Shape::Static("Promise", "reject"))
            .produces(Promise)
            .resolved(nothing),
        Entry::new(Shape::Static("Promise", "all"))
            .produces(Promise)
            .resolved(settles_to_itself)
            .element(all_elements),
        Entry::new(Shape::Static("Promise", "race"))
            .produces(Promise)
            .resolved(race),
        Entry::new(Shape::Constructor("Promise"))
            .produces(Promise)
            .resolved(executor_resolved)
            .binder(external_binding),
        method(Promise, "then")
            .produces(Promise)
            .resolved(then_resolved)
            .binder(then_binding),
        method(Promise, "catch")
            .produces(Promise)
            .resolved(catch_resolved)
            .binder(external_binding),
        method(Promise, "finally")
            .produces(Promise)
            .resolved(finally_resolved),
        // Map
        Entry::new(Shape::Constructor("Map")).produces(Map),
        method(Map, "get").call(map_get),
        method(Map, "set").call(receiver),
        method(Map, "has").produces(Boolean),
        method(Map, "delete").produces(Boolean),
        method(Map, "keys").produces(Array).element(external_elements),
        method(Map, "values").produces(Array).element(map_value_elements),
        method(Map, "entries").produces(Array).element(external_elements),
        method(Map, "forEach").call(nothing).binder(map_binding),
        method(Map, "size").produces(Number).getter(),
        // Set
        Entry::new(Shape::Constructor("Set")).produces(Set),
        method(Set, "add").call(receiver),
        method(Set, "has").produces(Boolean),
        method(Set, "forEach").call(nothing).binder(set_binding),
        method(Set, "size").produces(Number).getter(),
        // Date
        Entry::new(Shape::Constructor("Date")).produces(Date),
        Entry::new(Shape::Static("Date", "now")).produces(Number),
        method(Date, "toISOString").produces(String),
        method(Date, "getTime").produces(Number),
        // Error
        Entry::new(Shape::Constructor("Error"))
            .produces(Error)
            .property(error_property),
        method(Error, "message").produces(String).getter(),
        method(Error, "stack").produces(String).getter(),
        // RegExp
        Entry::new(Shape::Constructor("RegExp")).produces(RegExp),
        method(RegExp, "test").produces(Boolean),
        // Globals
        Entry::new(Shape::Static("Math", "*")).produces(Number).call(external),
        Entry::new(Shape::Global("parseInt")).produces(Number),
        Entry::new(Shape::Global("parseFloat")).produces(Number),
        Entry::new(Shape::Global("String")).produces(String),
        Entry::new(Shape::Global("Number")).produces(Number),
        Entry::new(Shape::Global("Boolean")).produces(Boolean),
        Entry::new(Shape::Global("fetch")).produces(Promise),
        Entry::new(Shape::Global("setTimeout"))
            .call(external)
            .binder(external_binding),
    ];
    entries.extend(methods(
        String,
        &[
            "trim",
            "toUpperCase",
            "toLowerCase",
            "slice",
            "substring",
            "concat",
            "padStart",
        ],
        String,
    ));
    entries.extend(methods(
        String,
        &["includes", "startsWith", "endsWith"],
        Boolean,
    ));
    for name in ["log", "error", "warn", "info"] {
        entries.push(Entry::new(Shape::Static("console", name)).call(nothing));
    }
    for kind in [Array, Number, Boolean, Object, Date, Error, RegExp] {
        entries.push(method(kind, "toString").produces(String));
    }
    entries.push(method(Number, "toFixed").produces(String));
    entries
}
