use crate::lexer::{IdentifierTable, Symbol};

/// Nodes are represented as indices into the [`Ast`] arena. The arena is
/// shared by every module of a program and never changes after the program
/// is built, so ids can be freely copied into analysis facts.
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug, PartialOrd, Ord)]
pub struct NodeId(pub u32);

#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug, PartialOrd, Ord)]
pub struct ModuleId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DeclKind {
    Const,
    Let,
    Var,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct FunctionFlags {
    pub is_arrow: bool,
    pub is_async: bool,
    pub is_declaration: bool,
    /// Arrow functions whose body is a single expression.
    pub expression_body: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PropKey {
    Named(Symbol),
    Computed(NodeId),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ImportKind {
    Default,
    Named(Symbol),
    Namespace,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Exp,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
    Less,
    Greater,
    LessEq,
    GreaterEq,
    In,
    Instanceof,
    BitAnd,
    BitOr,
    BitXor,
    ShiftLeft,
    ShiftRight,
    ShiftRightUnsigned,
}

impl BinaryOp {
    pub fn is_bitwise(self) -> bool {
        matches!(
            self,
            BinaryOp::BitAnd
                | BinaryOp::BitOr
                | BinaryOp::BitXor
                | BinaryOp::ShiftLeft
                | BinaryOp::ShiftRight
                | BinaryOp::ShiftRightUnsigned
        )
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq
                | BinaryOp::NotEq
                | BinaryOp::StrictEq
                | BinaryOp::StrictNotEq
                | BinaryOp::Less
                | BinaryOp::Greater
                | BinaryOp::LessEq
                | BinaryOp::GreaterEq
                | BinaryOp::In
                | BinaryOp::Instanceof
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LogicalOp {
    And,
    Or,
    Nullish,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Not,
    Neg,
    Plus,
    BitNot,
    Typeof,
    Void,
    Delete,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AssignOp {
    Assign,
    Arithmetic(BinaryOp),
    Logical(LogicalOp),
}

#[derive(Clone, Debug, PartialEq)]
pub enum NodeKind {
    Module {
        body: Vec<NodeId>,
    },
    Block {
        body: Vec<NodeId>,
    },
    Empty,
    VarDecl {
        kind: DeclKind,
        declarators: Vec<NodeId>,
    },
    Declarator {
        target: NodeId,
        init: Option<NodeId>,
    },
    Function {
        name: Option<NodeId>,
        params: Vec<NodeId>,
        body: NodeId,
        flags: FunctionFlags,
    },
    Return {
        value: Option<NodeId>,
    },
    If {
        test: NodeId,
        then: NodeId,
        els: Option<NodeId>,
    },
    While {
        test: NodeId,
        body: NodeId,
    },
    For {
        init: Option<NodeId>,
        test: Option<NodeId>,
        update: Option<NodeId>,
        body: NodeId,
    },
    /// `for (head of iterated)`, or `for (head in iterated)` when `is_in`.
    ForOf {
        is_in: bool,
        head: NodeId,
        iterated: NodeId,
        body: NodeId,
    },
    Try {
        block: NodeId,
        handler: Option<NodeId>,
        finalizer: Option<NodeId>,
    },
    Catch {
        param: Option<NodeId>,
        body: NodeId,
    },
    Throw {
        value: NodeId,
    },
    Break,
    Continue,
    ExprStmt {
        expr: NodeId,
    },
    Import {
        specifiers: Vec<NodeId>,
        source: Symbol,
    },
    ImportSpecifier {
        kind: ImportKind,
        local: NodeId,
    },
    /// `export` in front of a declaration.
    Export {
        decl: NodeId,
    },
    ExportDefault {
        value: NodeId,
    },
    ExportNamed {
        specifiers: Vec<NodeId>,
        source: Option<Symbol>,
    },
    ExportSpecifier {
        local: NodeId,
        exported: Symbol,
    },

    /// A reference to a variable.
    Identifier {
        name: Symbol,
    },
    /// The defining occurrence of a variable.
    Binding {
        name: Symbol,
    },
    Number {
        text: Symbol,
    },
    Str {
        value: Symbol,
    },
    Template {
        quasis: Vec<Symbol>,
        exprs: Vec<NodeId>,
    },
    Bool {
        value: bool,
    },
    Null,
    Undefined,
    This,
    Object {
        properties: Vec<NodeId>,
    },
    Property {
        key: PropKey,
        value: NodeId,
        shorthand: bool,
    },
    Array {
        elements: Vec<Option<NodeId>>,
    },
    Spread {
        argument: NodeId,
    },
    Call {
        callee: NodeId,
        arguments: Vec<NodeId>,
        optional: bool,
    },
    New {
        callee: NodeId,
        arguments: Vec<NodeId>,
    },
    Member {
        object: NodeId,
        property: Symbol,
        optional: bool,
    },
    Index {
        object: NodeId,
        index: NodeId,
        optional: bool,
    },
    Binary {
        op: BinaryOp,
        lhs: NodeId,
        rhs: NodeId,
    },
    Logical {
        op: LogicalOp,
        lhs: NodeId,
        rhs: NodeId,
    },
    Conditional {
        test: NodeId,
        then: NodeId,
        els: NodeId,
    },
    Unary {
        op: UnaryOp,
        operand: NodeId,
    },
    Update {
        increment: bool,
        prefix: bool,
        operand: NodeId,
    },
    Assign {
        op: AssignOp,
        target: NodeId,
        value: NodeId,
    },
    Await {
        argument: NodeId,
    },

    // Patterns
    ObjectPattern {
        properties: Vec<NodeId>,
    },
    ArrayPattern {
        elements: Vec<Option<NodeId>>,
    },
    AssignPattern {
        target: NodeId,
        default: NodeId,
    },
    Rest {
        argument: NodeId,
    },
}

#[derive(Clone, Debug)]
pub struct Node {
    pub kind: NodeKind,
    pub module: ModuleId,
    pub line: u32,
    /// Byte offsets into the module source.
    pub start: u32,
    pub end: u32,
    pub parent: Option<NodeId>,
    /// The innermost function strictly enclosing the node.
    pub function: Option<NodeId>,
    /// Number of functions strictly enclosing the node.
    pub depth: u32,
}

#[derive(Clone, Debug)]
pub struct SourceModule {
    pub path: String,
    pub source: String,
    pub root: NodeId,
    pub lines: utils::LineIndex,
}

/// Arena of syntax nodes for all the modules of a program.
#[derive(Clone, Debug, Default)]
pub struct Ast {
    nodes: Vec<Node>,
    modules: Vec<SourceModule>,
    pub identifiers: IdentifierTable,
}

impl Ast {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, kind: NodeKind, module: ModuleId, line: u32, span: (u32, u32)) -> NodeId {
        self.nodes.push(Node {
            kind,
            module,
            line,
            start: span.0,
            end: span.1,
            parent: None,
            function: None,
            depth: 0,
        });
        NodeId(self.nodes.len() as u32 - 1)
    }

    pub fn add_module(&mut self, path: &str, source: &str, root: NodeId) -> ModuleId {
        self.modules.push(SourceModule {
            path: path.to_owned(),
            source: source.to_owned(),
            root,
            lines: utils::LineIndex::new(source),
        });
        let id = ModuleId(self.modules.len() as u32 - 1);
        self.link(root, None, None, 0);
        id
    }

    /// Fills in the parent links and the enclosing functions.
    fn link(&mut self, node: NodeId, parent: Option<NodeId>, function: Option<NodeId>, depth: u32) {
        let mut stack = vec![(node, parent, function, depth)];
        while let Some((node, parent, function, depth)) = stack.pop() {
            let data = &mut self.nodes[node.0 as usize];
            data.parent = parent;
            data.function = function;
            data.depth = depth;
            let (inner_function, inner_depth) = if matches!(data.kind, NodeKind::Function { .. }) {
                (Some(node), depth + 1)
            } else {
                (function, depth)
            };
            for child in self.children(node) {
                stack.push((child, Some(node), inner_function, inner_depth));
            }
        }
    }

    /// The id the next registered module will get. Nodes of a module are
    /// created before the module itself is registered.
    pub fn next_module_id(&self) -> ModuleId {
        ModuleId(self.modules.len() as u32)
    }

    /// Used by the parser to reinterpret expressions as patterns.
    pub fn set_kind(&mut self, node: NodeId, kind: NodeKind) {
        self.nodes[node.0 as usize].kind = kind;
    }

    pub fn node(&self, node: NodeId) -> &Node {
        &self.nodes[node.0 as usize]
    }

    pub fn kind(&self, node: NodeId) -> &NodeKind {
        &self.nodes[node.0 as usize].kind
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.node(node).parent
    }

    pub fn line(&self, node: NodeId) -> u32 {
        self.node(node).line
    }

    pub fn depth(&self, node: NodeId) -> usize {
        self.node(node).depth as usize
    }

    pub fn enclosing_function(&self, node: NodeId) -> Option<NodeId> {
        self.node(node).function
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len() as u32).map(NodeId)
    }

    pub fn modules(&self) -> &[SourceModule] {
        &self.modules
    }

    pub fn module(&self, id: ModuleId) -> &SourceModule {
        &self.modules[id.0 as usize]
    }

    pub fn module_of(&self, node: NodeId) -> ModuleId {
        self.node(node).module
    }

    pub fn name(&self, sym: Symbol) -> &str {
        self.identifiers.get_name(sym)
    }

    /// The name of identifiers and bindings.
    pub fn ident_name(&self, node: NodeId) -> Option<&str> {
        match self.kind(node) {
            NodeKind::Identifier { name } | NodeKind::Binding { name } => Some(self.name(*name)),
            _ => None,
        }
    }

    pub fn is_function(&self, node: NodeId) -> bool {
        matches!(self.kind(node), NodeKind::Function { .. })
    }

    pub fn function_flags(&self, node: NodeId) -> Option<FunctionFlags> {
        match self.kind(node) {
            NodeKind::Function { flags, .. } => Some(*flags),
            _ => None,
        }
    }

    /// The name a function can be referred to by: its own name, or the
    /// variable or property it is directly stored in.
    pub fn function_name(&self, node: NodeId) -> Option<&str> {
        if let NodeKind::Function { name: Some(name), .. } = self.kind(node) {
            return self.ident_name(*name);
        }
        let parent = self.parent(node)?;
        match self.kind(parent) {
            NodeKind::Declarator { target, .. } => self.ident_name(*target),
            NodeKind::Property {
                key: PropKey::Named(key),
                ..
            } => Some(self.name(*key)),
            NodeKind::Assign { target, .. } => match self.kind(*target) {
                NodeKind::Member { property, .. } => Some(self.name(*property)),
                _ => self.ident_name(*target),
            },
            _ => None,
        }
    }

    /// The callee and arguments of call and `new` expressions.
    pub fn call_parts(&self, node: NodeId) -> Option<(NodeId, &[NodeId])> {
        match self.kind(node) {
            NodeKind::Call {
                callee, arguments, ..
            }
            | NodeKind::New { callee, arguments } => Some((*callee, arguments)),
            _ => None,
        }
    }

    pub fn is_call(&self, node: NodeId) -> bool {
        self.call_parts(node).is_some()
    }

    /// Whether `node` is the callee of its parent call.
    pub fn callee_of(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.parent(node)?;
        match self.call_parts(parent) {
            Some((callee, _)) if callee == node => Some(parent),
            _ => None,
        }
    }

    /// The call `node` is an argument of, and the argument position.
    pub fn argument_of(&self, node: NodeId) -> Option<(NodeId, usize)> {
        let parent = self.parent(node)?;
        let (_, arguments) = self.call_parts(parent)?;
        let position = arguments.iter().position(|&arg| arg == node)?;
        Some((parent, position))
    }

    /// The statements returning a value from `function`, not including the
    /// ones of nested functions. Arrow functions with an expression body
    /// return that expression.
    pub fn returned_values(&self, function: NodeId) -> Vec<NodeId> {
        let NodeKind::Function { body, flags, .. } = self.kind(function) else {
            return Vec::new();
        };
        if flags.expression_body {
            return vec![*body];
        }
        self.descendants_in_function(*body)
            .into_iter()
            .filter_map(|n| match self.kind(n) {
                NodeKind::Return { value } => *value,
                _ => None,
            })
            .collect()
    }

    /// All the nodes under `root` in source order, without descending into
    /// nested functions (the nested function nodes themselves are included).
    pub fn descendants_in_function(&self, root: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            result.push(node);
            if node != root && self.is_function(node) {
                continue;
            }
            let mut children = self.children(node);
            children.reverse();
            stack.extend(children);
        }
        result
    }

    /// All the nodes under `root` in source order.
    pub fn descendants(&self, root: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            result.push(node);
            let mut children = self.children(node);
            children.reverse();
            stack.extend(children);
        }
        result
    }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        use NodeKind::*;
        let mut out = Vec::new();
        match self.kind(node) {
            Module { body } | Block { body } => out.extend(body),
            VarDecl { declarators, .. } => out.extend(declarators),
            Declarator { target, init } => {
                out.push(*target);
                out.extend(init);
            }
            Function {
                name, params, body, ..
            } => {
                out.extend(name);
                out.extend(params);
                out.push(*body);
            }
            Return { value } => out.extend(value),
            If { test, then, els } => {
                out.extend([*test, *then]);
                out.extend(els);
            }
            While { test, body } => out.extend([*test, *body]),
            For {
                init,
                test,
                update,
                body,
            } => {
                out.extend(init);
                out.extend(test);
                out.extend(update);
                out.push(*body);
            }
            ForOf {
                head,
                iterated,
                body,
                ..
            } => out.extend([*head, *iterated, *body]),
            Try {
                block,
                handler,
                finalizer,
            } => {
                out.push(*block);
                out.extend(handler);
                out.extend(finalizer);
            }
            Catch { param, body } => {
                out.extend(param);
                out.push(*body);
            }
            Throw { value } => out.push(*value),
            ExprStmt { expr } => out.push(*expr),
            Import { specifiers, .. } => out.extend(specifiers),
            ImportSpecifier { local, .. } => out.push(*local),
            Export { decl } => out.push(*decl),
            ExportDefault { value } => out.push(*value),
            ExportNamed { specifiers, .. } => out.extend(specifiers),
            ExportSpecifier { local, .. } => out.push(*local),
            Template { exprs, .. } => out.extend(exprs),
            Object { properties } | ObjectPattern { properties } => out.extend(properties),
            Property { key, value, .. } => {
                if let PropKey::Computed(key) = key {
                    out.push(*key);
                }
                out.push(*value);
            }
            Array { elements } | ArrayPattern { elements } => {
                out.extend(elements.iter().flatten());
            }
            Spread { argument } | Rest { argument } | Await { argument } => out.push(*argument),
            Call {
                callee, arguments, ..
            }
            | New { callee, arguments } => {
                out.push(*callee);
                out.extend(arguments);
            }
            Member { object, .. } => out.push(*object),
            Index { object, index, .. } => out.extend([*object, *index]),
            Binary { lhs, rhs, .. } | Logical { lhs, rhs, .. } => out.extend([*lhs, *rhs]),
            Conditional { test, then, els } => out.extend([*test, *then, *els]),
            Unary { operand, .. } | Update { operand, .. } => out.push(*operand),
            Assign { target, value, .. } => out.extend([*target, *value]),
            AssignPattern { target, default } => out.extend([*target, *default]),
            Empty | Break | Continue | Identifier { .. } | Binding { .. } | Number { .. }
            | Str { .. } | Bool { .. } | Null | Undefined | This => {}
        }
        out
    }

    /// The source text of the node.
    pub fn text(&self, node: NodeId) -> &str {
        let data = self.node(node);
        let source = &self.module(data.module).source;
        source
            .get(data.start as usize..data.end as usize)
            .unwrap_or_default()
    }

    pub fn location(&self, node: NodeId) -> utils::Location {
        let data = self.node(node);
        self.module(data.module).lines.location(data.start as usize)
    }

    /// A stable, single-line rendering of the node's source text.
    pub fn label(&self, node: NodeId) -> String {
        const MAX_LABEL: usize = 48;
        let text = self.text(node).split_whitespace().collect::<Vec<_>>().join(" ");
        if text.chars().count() > MAX_LABEL {
            let prefix: String = text.chars().take(MAX_LABEL - 3).collect();
            format!("{prefix}...")
        } else {
            text
        }
    }
}
