use rustc_hash::{FxHashMap, FxHashSet};

use crate::{
    ast::{Ast, DeclKind, ImportKind, ModuleId, NodeId, NodeKind},
    lexer::Symbol,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeclId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BindingKind {
    Variable(DeclKind),
    Function,
    Parameter,
    CatchParameter,
    Import,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Decl {
    pub name: Symbol,
    pub kind: BindingKind,
    /// The defining occurrence.
    pub binding: NodeId,
    /// The node owning the scope the name is declared in.
    pub scope: NodeId,
}

/// Where an imported name leads.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ImportTarget {
    /// A declaration in another module.
    Decl(DeclId),
    /// The expression of an `export default`.
    Expression(NodeId),
    /// `import * as ns`.
    Namespace(ModuleId),
    /// A package or a name the module does not export.
    External,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum ExportName {
    Default,
    Named(Symbol),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Export {
    Local(DeclId),
    Expression(NodeId),
    Reexport(ModuleId, ExportName),
    Unresolved,
}

/// Symbol tables of a whole program: which declaration each identifier
/// refers to, the references of each declaration, and how imports resolve
/// against exports.
#[derive(Clone, Debug, Default)]
pub struct Scopes {
    decls: Vec<Decl>,
    declared: FxHashMap<(NodeId, Symbol), DeclId>,
    symbols: FxHashMap<NodeId, DeclId>,
    references: Vec<Vec<NodeId>>,
    exports: FxHashMap<(ModuleId, ExportName), Export>,
    imports: FxHashMap<DeclId, ImportTarget>,
    importers: FxHashMap<ImportTarget, Vec<DeclId>>,
}

pub fn is_scope(kind: &NodeKind) -> bool {
    matches!(
        kind,
        NodeKind::Module { .. }
            | NodeKind::Function { .. }
            | NodeKind::Block { .. }
            | NodeKind::For { .. }
            | NodeKind::ForOf { .. }
            | NodeKind::Catch { .. }
    )
}

/// The binding occurrences introduced by a pattern, in source order.
pub fn pattern_bindings(ast: &Ast, pattern: NodeId) -> Vec<NodeId> {
    let mut result = Vec::new();
    let mut stack = vec![pattern];
    while let Some(node) = stack.pop() {
        match ast.kind(node) {
            NodeKind::Binding { .. } => result.push(node),
            NodeKind::ObjectPattern { properties } => stack.extend(properties.iter().rev()),
            NodeKind::Property { value, .. } => stack.push(*value),
            NodeKind::ArrayPattern { elements } => stack.extend(elements.iter().flatten().rev()),
            NodeKind::AssignPattern { target, .. } => stack.push(*target),
            NodeKind::Rest { argument } => stack.push(*argument),
            _ => {}
        }
    }
    result
}

impl Scopes {
    /// `resolve` maps an import specifier of a module to a loaded module.
    pub fn build(ast: &Ast, resolve: impl Fn(ModuleId, &str) -> Option<ModuleId>) -> Self {
        let mut scopes = Self::default();
        for module in ast.modules() {
            scopes.declare(ast, module.root, module.root, module.root);
        }
        for node in ast.node_ids() {
            scopes.resolve_reference(ast, node);
        }
        for (idx, module) in ast.modules().iter().enumerate() {
            scopes.collect_exports(ast, ModuleId(idx as u32), module.root, &resolve);
        }
        scopes.resolve_imports(ast, &resolve);
        scopes
    }

    fn add_decl(&mut self, ast: &Ast, binding: NodeId, kind: BindingKind, scope: NodeId) {
        let NodeKind::Binding { name } = *ast.kind(binding) else {
            return;
        };
        let id = match self.declared.get(&(scope, name)) {
            // Redeclarations with `var` or of functions share one declaration.
            Some(&id) => id,
            None => {
                let id = DeclId(self.decls.len() as u32);
                self.decls.push(Decl {
                    name,
                    kind,
                    binding,
                    scope,
                });
                self.references.push(Vec::new());
                self.declared.insert((scope, name), id);
                id
            }
        };
        self.symbols.insert(binding, id);
    }

    fn declare(&mut self, ast: &Ast, node: NodeId, scope: NodeId, var_scope: NodeId) {
        let (scope, var_scope) = match ast.kind(node) {
            NodeKind::Function {
                name,
                params,
                flags,
                ..
            } => {
                if let Some(name) = *name {
                    let owner = if flags.is_declaration { scope } else { node };
                    self.add_decl(ast, name, BindingKind::Function, owner);
                }
                for &param in params {
                    for binding in pattern_bindings(ast, param) {
                        self.add_decl(ast, binding, BindingKind::Parameter, node);
                    }
                }
                (node, node)
            }
            NodeKind::VarDecl { kind, declarators } => {
                let owner = if *kind == DeclKind::Var {
                    var_scope
                } else {
                    scope
                };
                for &declarator in declarators {
                    if let NodeKind::Declarator { target, .. } = ast.kind(declarator) {
                        for binding in pattern_bindings(ast, *target) {
                            self.add_decl(ast, binding, BindingKind::Variable(*kind), owner);
                        }
                    }
                }
                (scope, var_scope)
            }
            NodeKind::Catch { param, .. } => {
                if let Some(param) = *param {
                    for binding in pattern_bindings(ast, param) {
                        self.add_decl(ast, binding, BindingKind::CatchParameter, node);
                    }
                }
                (node, var_scope)
            }
            NodeKind::ImportSpecifier { local, .. } => {
                self.add_decl(ast, *local, BindingKind::Import, var_scope);
                (scope, var_scope)
            }
            kind if is_scope(kind) => (node, var_scope),
            _ => (scope, var_scope),
        };
        for child in ast.children(node) {
            self.declare(ast, child, scope, var_scope);
        }
    }

    fn resolve_reference(&mut self, ast: &Ast, node: NodeId) {
        let NodeKind::Identifier { name } = *ast.kind(node) else {
            return;
        };
        let mut current = ast.parent(node);
        while let Some(ancestor) = current {
            if let Some(&id) = self.declared.get(&(ancestor, name)) {
                self.symbols.insert(node, id);
                self.references[id.0 as usize].push(node);
                return;
            }
            current = ast.parent(ancestor);
        }
    }

    fn collect_exports(
        &mut self,
        ast: &Ast,
        module: ModuleId,
        root: NodeId,
        resolve: &impl Fn(ModuleId, &str) -> Option<ModuleId>,
    ) {
        let NodeKind::Module { body } = ast.kind(root) else {
            return;
        };
        for &stmt in body {
            match ast.kind(stmt) {
                NodeKind::Export { decl } => {
                    let bindings = match ast.kind(*decl) {
                        NodeKind::VarDecl { declarators, .. } => declarators
                            .iter()
                            .filter_map(|&d| match ast.kind(d) {
                                NodeKind::Declarator { target, .. } => Some(*target),
                                _ => None,
                            })
                            .flat_map(|target| pattern_bindings(ast, target))
                            .collect(),
                        NodeKind::Function { name, .. } => name.iter().copied().collect(),
                        _ => Vec::new(),
                    };
                    for binding in bindings {
                        if let (Some(&id), NodeKind::Binding { name }) =
                            (self.symbols.get(&binding), ast.kind(binding))
                        {
                            self.exports
                                .insert((module, ExportName::Named(*name)), Export::Local(id));
                        }
                    }
                }
                NodeKind::ExportDefault { value } => {
                    self.exports
                        .insert((module, ExportName::Default), Export::Expression(*value));
                }
                NodeKind::ExportNamed { specifiers, source } => {
                    let from = source.map(|source| resolve(module, ast.name(source)));
                    for &spec in specifiers {
                        let NodeKind::ExportSpecifier { local, exported } = *ast.kind(spec) else {
                            continue;
                        };
                        let export = match from {
                            Some(Some(other)) => match ast.kind(local) {
                                NodeKind::Identifier { name } => {
                                    Export::Reexport(other, export_name(ast, *name))
                                }
                                _ => Export::Unresolved,
                            },
                            Some(None) => Export::Unresolved,
                            None => self
                                .symbols
                                .get(&local)
                                .map_or(Export::Unresolved, |&id| Export::Local(id)),
                        };
                        self.exports
                            .insert((module, export_name(ast, exported)), export);
                    }
                }
                _ => {}
            }
        }
    }

    fn resolve_imports(&mut self, ast: &Ast, resolve: &impl Fn(ModuleId, &str) -> Option<ModuleId>) {
        for idx in 0..self.decls.len() {
            let decl = self.decls[idx];
            if decl.kind != BindingKind::Import {
                continue;
            }
            let id = DeclId(idx as u32);
            let target = self.import_target(ast, decl, resolve);
            self.imports.insert(id, target);
            self.importers.entry(target).or_default().push(id);
        }
    }

    /// Follows imports of imported names until a non-import declaration, an
    /// exported expression, a namespace or an unresolved name is reached.
    fn import_target(
        &self,
        ast: &Ast,
        decl: Decl,
        resolve: &impl Fn(ModuleId, &str) -> Option<ModuleId>,
    ) -> ImportTarget {
        let mut current = decl;
        let mut visited = FxHashSet::default();
        while visited.insert(current.binding) {
            let Some(spec) = ast.parent(current.binding) else {
                break;
            };
            let NodeKind::ImportSpecifier { kind, .. } = *ast.kind(spec) else {
                break;
            };
            let Some(NodeKind::Import { source, .. }) = ast.parent(spec).map(|import| ast.kind(import))
            else {
                break;
            };
            let Some(module) = resolve(ast.module_of(spec), ast.name(*source)) else {
                break;
            };
            let name = match kind {
                ImportKind::Namespace => return ImportTarget::Namespace(module),
                ImportKind::Named(name) => ExportName::Named(name),
                ImportKind::Default => ExportName::Default,
            };
            match self.export_target(module, name) {
                Some(Export::Local(id)) if self.decl(id).kind == BindingKind::Import => {
                    current = self.decl(id);
                }
                Some(Export::Local(id)) => return ImportTarget::Decl(id),
                Some(Export::Expression(value)) => return ImportTarget::Expression(value),
                _ => break,
            }
        }
        ImportTarget::External
    }

    /// The export of `module` named `name` after following re-exports.
    fn export_target(&self, module: ModuleId, name: ExportName) -> Option<Export> {
        let mut current = (module, name);
        let mut seen = FxHashSet::default();
        while seen.insert(current) {
            match self.exports.get(&current)? {
                Export::Reexport(other, other_name) => current = (*other, *other_name),
                export => return Some(*export),
            }
        }
        None
    }

    pub fn decl(&self, id: DeclId) -> Decl {
        self.decls[id.0 as usize]
    }

    pub fn decls(&self) -> impl Iterator<Item = (DeclId, &Decl)> {
        self.decls
            .iter()
            .enumerate()
            .map(|(idx, decl)| (DeclId(idx as u32), decl))
    }

    /// The declaration of an identifier or binding occurrence.
    pub fn symbol_at(&self, node: NodeId) -> Option<DeclId> {
        self.symbols.get(&node).copied()
    }

    pub fn declaring_scope(&self, id: DeclId) -> NodeId {
        self.decl(id).scope
    }

    /// The non-defining occurrences of the declaration, assignment targets
    /// included.
    pub fn find_references(&self, id: DeclId) -> &[NodeId] {
        &self.references[id.0 as usize]
    }

    pub fn resolve_import(&self, id: DeclId) -> ImportTarget {
        self.imports
            .get(&id)
            .copied()
            .unwrap_or(ImportTarget::External)
    }

    /// The import declarations resolving to `target`.
    pub fn importers(&self, target: ImportTarget) -> &[DeclId] {
        self.importers.get(&target).map_or(&[], Vec::as_slice)
    }

    /// What a module exports under `name`, following re-exports.
    pub fn export_of(&self, ast: &Ast, module: ModuleId, name: &str) -> ImportTarget {
        let name = if name == "default" {
            ExportName::Default
        } else {
            match ast.identifiers.lookup(name) {
                Some(sym) => ExportName::Named(sym),
                None => return ImportTarget::External,
            }
        };
        match self.export_target(module, name) {
            Some(Export::Local(id)) if self.decl(id).kind == BindingKind::Import => {
                self.resolve_import(id)
            }
            Some(Export::Local(id)) => ImportTarget::Decl(id),
            Some(Export::Expression(value)) => ImportTarget::Expression(value),
            _ => ImportTarget::External,
        }
    }
}

fn export_name(ast: &Ast, name: Symbol) -> ExportName {
    if ast.name(name) == "default" {
        ExportName::Default
    } else {
        ExportName::Named(name)
    }
}
