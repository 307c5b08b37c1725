use analysis::{contexts::EnvId, domains::PowerSet};

use crate::ast::NodeId;

/// A point of the analyzed program a value can originate from or flow to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Cursor {
    Syntax(NodeId),
    /// The arguments of `call` from `position` onward, e.g., the array bound
    /// to a rest parameter.
    ArgumentList { call: NodeId, position: u32 },
    /// An element of the array `expression` evaluates to. `None` stands for
    /// an unknown position.
    ElementPick {
        expression: NodeId,
        position: Option<u32>,
    },
    /// A value originating outside of the analyzed code.
    External,
}

impl Cursor {
    pub fn node(self) -> Option<NodeId> {
        match self {
            Cursor::Syntax(node) => Some(node),
            _ => None,
        }
    }
}

impl From<NodeId> for Cursor {
    fn from(node: NodeId) -> Self {
        Cursor::Syntax(node)
    }
}

/// A program point reached under an environment of calling contexts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Config {
    pub cursor: Cursor,
    pub env: EnvId,
}

impl Config {
    pub fn new(cursor: impl Into<Cursor>, env: EnvId) -> Self {
        Self {
            cursor: cursor.into(),
            env,
        }
    }

    pub fn node(self) -> Option<NodeId> {
        self.cursor.node()
    }

    pub fn is_external(self) -> bool {
        self.cursor == Cursor::External
    }
}

pub type ConfigSet = PowerSet<Config>;

/// The computations of the analysis, see [`crate::flow`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum QueryKind {
    /// The constructors an expression may evaluate to.
    Evaluate,
    /// The calls invoking a function value.
    Applied,
    /// The expressions a value flows to.
    Traced,
    /// The calls entering a function body under a context.
    Callers,
    /// The origins of a variable.
    Bind,
    /// The concrete body environments a function was entered with. Only
    /// ever grown from the outside.
    Entered,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Query {
    pub kind: QueryKind,
    pub config: Config,
}

impl Query {
    pub fn new(kind: QueryKind, config: Config) -> Self {
        Self { kind, config }
    }
}
