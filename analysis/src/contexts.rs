use core::hash::Hash;

use indexmap::IndexSet;
use rustc_hash::FxBuildHasher;

/// Index of an interned [`Context`] in a [`ContextArena`]. Two ids are equal
/// exactly when the call strings they denote are structurally equal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(u32);

/// A bounded call string. `S` identifies call sites, `F` identifies
/// functions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Context<S, F> {
    /// The root of every call string: no caller at all.
    StackBottom,
    /// The rest of the call string was cut off by the m-CFA bound.
    Limit,
    /// Any caller of the function, i.e., the call string is not known yet.
    Question(F),
    Frame { site: S, tail: ContextId },
}

/// Arena of call strings. Every `Frame` refers to its tail by index, so the
/// tails are shared between all the contexts extending them, and interning
/// guarantees that structurally equal chains get the same [`ContextId`].
#[derive(Clone, Debug)]
pub struct ContextArena<S, F> {
    nodes: IndexSet<Context<S, F>, FxBuildHasher>,
}

impl<S, F> Default for ContextArena<S, F>
where
    S: Copy + Eq + Hash,
    F: Copy + Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<S, F> ContextArena<S, F>
where
    S: Copy + Eq + Hash,
    F: Copy + Eq + Hash,
{
    const STACK_BOTTOM: ContextId = ContextId(0);
    const LIMIT: ContextId = ContextId(1);

    pub fn new() -> Self {
        let mut nodes = IndexSet::default();
        nodes.insert(Context::StackBottom);
        nodes.insert(Context::Limit);
        Self { nodes }
    }

    pub fn stack_bottom(&self) -> ContextId {
        Self::STACK_BOTTOM
    }

    pub fn limit(&self) -> ContextId {
        Self::LIMIT
    }

    pub fn question(&mut self, function: F) -> ContextId {
        self.intern(Context::Question(function))
    }

    pub fn frame(&mut self, site: S, tail: ContextId) -> ContextId {
        self.intern(Context::Frame { site, tail })
    }

    fn intern(&mut self, ctx: Context<S, F>) -> ContextId {
        let (idx, _) = self.nodes.insert_full(ctx);
        ContextId(idx as u32)
    }

    pub fn get(&self, id: ContextId) -> &Context<S, F> {
        &self.nodes[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of `Frame` links in the chain.
    pub fn depth(&self, id: ContextId) -> usize {
        let mut depth = 0;
        let mut current = id;
        while let Context::Frame { tail, .. } = *self.get(current) {
            depth += 1;
            current = tail;
        }
        depth
    }

    /// The context ending the chain: `StackBottom`, `Limit` or a `Question`.
    pub fn terminal(&self, id: ContextId) -> ContextId {
        let mut current = id;
        while let Context::Frame { tail, .. } = *self.get(current) {
            current = tail;
        }
        current
    }

    /// The call sites of the chain, most recent first.
    pub fn sites(&self, id: ContextId) -> Vec<S> {
        let mut result = Vec::new();
        let mut current = id;
        while let Context::Frame { site, tail } = *self.get(current) {
            result.push(site);
            current = tail;
        }
        result
    }

    /// Keeps at most `m` frames of the chain. Whatever is beyond the bound
    /// is replaced by `Limit`. Chains that end within the bound keep their
    /// terminal context.
    pub fn truncate(&mut self, id: ContextId, m: usize) -> ContextId {
        match *self.get(id) {
            Context::Frame { site, tail } => {
                if m == 0 {
                    return Self::LIMIT;
                }
                let tail = self.truncate(tail, m - 1);
                self.frame(site, tail)
            }
            _ => id,
        }
    }

    /// Prepends `site` to `head` and truncates the result to `m` frames.
    pub fn push(&mut self, site: S, head: ContextId, m: usize) -> ContextId {
        if m == 0 {
            return Self::LIMIT;
        }
        let tail = self.truncate(head, m - 1);
        self.frame(site, tail)
    }

    /// Whether `a` is at least as specific as `b`. A `Question` or a `Limit`
    /// in `b` accepts anything, frames must agree on their call sites.
    pub fn refines(&self, a: ContextId, b: ContextId) -> bool {
        if a == b {
            return true;
        }
        match (*self.get(a), *self.get(b)) {
            (_, Context::Question(_) | Context::Limit) => true,
            (
                Context::Frame {
                    site: site_a,
                    tail: tail_a,
                },
                Context::Frame {
                    site: site_b,
                    tail: tail_b,
                },
            ) => site_a == site_b && self.refines(tail_a, tail_b),
            _ => false,
        }
    }

    pub fn render(
        &self,
        id: ContextId,
        site_label: &impl Fn(S) -> String,
        function_label: &impl Fn(F) -> String,
    ) -> String {
        match *self.get(id) {
            Context::StackBottom => "()".to_owned(),
            Context::Limit => "*".to_owned(),
            Context::Question(f) => format!("?{}", function_label(f)),
            Context::Frame { site, tail } => format!(
                "{} :: {}",
                site_label(site),
                self.render(tail, site_label, function_label)
            ),
        }
    }
}

/// Index of an interned environment in an [`EnvArena`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EnvId(u32);

/// Arena of environments. An environment is a non-empty stack of contexts,
/// one for each function enclosing a program point plus one for the
/// outermost (module) level. The head belongs to the innermost function.
#[derive(Clone, Debug, Default)]
pub struct EnvArena {
    envs: IndexSet<Box<[ContextId]>, FxBuildHasher>,
}

impl EnvArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, contexts: &[ContextId]) -> EnvId {
        assert!(!contexts.is_empty(), "Environments are never empty.");
        if let Some(idx) = self.envs.get_index_of(contexts) {
            return EnvId(idx as u32);
        }
        let (idx, _) = self.envs.insert_full(contexts.into());
        EnvId(idx as u32)
    }

    pub fn get(&self, env: EnvId) -> &[ContextId] {
        &self.envs[env.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.envs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.envs.is_empty()
    }

    pub fn head(&self, env: EnvId) -> ContextId {
        self.get(env)[0]
    }

    pub fn depth(&self, env: EnvId) -> usize {
        self.get(env).len()
    }

    /// The environment with `head` prepended.
    pub fn cons(&mut self, head: ContextId, tail: EnvId) -> EnvId {
        let mut contexts = Vec::with_capacity(self.depth(tail) + 1);
        contexts.push(head);
        contexts.extend_from_slice(self.get(tail));
        self.intern(&contexts)
    }

    /// The environment with `prefix` prepended, `prefix[0]` becomes the head.
    pub fn extend(&mut self, prefix: &[ContextId], tail: EnvId) -> EnvId {
        if prefix.is_empty() {
            return tail;
        }
        let mut contexts = prefix.to_vec();
        contexts.extend_from_slice(self.get(tail));
        self.intern(&contexts)
    }

    /// Drops the `n` innermost contexts. At least one context always stays.
    pub fn drop_inner(&mut self, env: EnvId, n: usize) -> EnvId {
        if n == 0 {
            return env;
        }
        let contexts = self.get(env);
        let n = n.min(contexts.len() - 1);
        let rest = contexts[n..].to_vec();
        self.intern(&rest)
    }

    pub fn replace(&mut self, env: EnvId, idx: usize, ctx: ContextId) -> EnvId {
        let mut contexts = self.get(env).to_vec();
        contexts[idx] = ctx;
        self.intern(&contexts)
    }
}
