use core::fmt::Debug;
use core::hash::Hash;
use std::collections::VecDeque;

use fixedbitset::FixedBitSet;
use indexmap::IndexSet;
use rustc_hash::{FxBuildHasher, FxHashSet};
use tracing::{debug, trace};

use crate::domains::JoinSemiLatticeNoContext;

/// A system of mutually recursive equations over a join semi-lattice. Every
/// query names one unknown, [`Equations::evaluate`] is the right-hand side
/// of its equation. The right-hand side reads other unknowns through
/// [`Fix::run`] and must be monotone in the values it reads.
pub trait Equations: Sized {
    type Query: Clone + Eq + Hash + Debug;
    type Value: JoinSemiLatticeNoContext;
    type Error: Clone;

    fn evaluate(
        &mut self,
        query: &Self::Query,
        fix: &mut Fix<'_, Self>,
    ) -> Result<Self::Value, Self::Error>;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SolverStats {
    /// Number of times a right-hand side was evaluated.
    pub evaluations: usize,
    /// Number of times a memoized value grew.
    pub updates: usize,
    /// Number of distinct queries seen.
    pub queries: usize,
}

/// Memoizing worklist solver computing the least fixpoint of an
/// [`Equations`] system on demand. Only the queries reachable from the ones
/// asked through [`FixpointSolver::value_of`] are ever evaluated.
///
/// Queries are interned, the memo table and the reverse dependency edges are
/// indexed by the interned ids. When a value grows, the computations that
/// read it are queued again. Reading a query never evaluates it in place, so
/// the depth of the dependency chains does not grow the stack.
///
/// A failed computation stays failed, and so does every computation that
/// read it: their memoized values would be incomplete.
pub struct FixpointSolver<E: Equations> {
    queries: IndexSet<E::Query, FxBuildHasher>,
    memo: Vec<Option<E::Value>>,
    failures: Vec<Option<E::Error>>,
    dependents: Vec<FxHashSet<usize>>,
    worklist: VecDeque<usize>,
    queued: FixedBitSet,
    stats: SolverStats,
}

impl<E: Equations> Default for FixpointSolver<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Equations> FixpointSolver<E> {
    pub fn new() -> Self {
        Self {
            queries: IndexSet::default(),
            memo: Vec::new(),
            failures: Vec::new(),
            dependents: Vec::new(),
            worklist: VecDeque::new(),
            queued: FixedBitSet::new(),
            stats: SolverStats::default(),
        }
    }

    /// Solves `query` and everything it depends on, then returns its value.
    /// Asking again after convergence evaluates nothing. Asking again after
    /// a failure reports the same failure.
    pub fn value_of(&mut self, equations: &mut E, query: E::Query) -> Result<E::Value, E::Error> {
        let id = self.intern(query);
        self.seed(id);
        self.drain(equations);
        self.current_value(id)
    }

    /// Joins `value` into the memoized value of `query` from the outside.
    /// If this grows the value, the readers of `query` are queued. A query
    /// that was never touched before is also queued, so its own equation is
    /// still evaluated. Returns whether the memo table changed.
    pub fn push_cache(&mut self, query: E::Query, value: &E::Value) -> bool {
        let id = self.intern(query);
        if self.failures[id].is_some() {
            return false;
        }
        match &mut self.memo[id] {
            None => {
                self.memo[id] = Some(value.clone());
                self.enqueue(id);
                true
            }
            Some(current) => {
                if !current.join_assign_(value) {
                    return false;
                }
                debug!(query = ?self.queries[id], "pushed facts grew a memoized value");
                self.stats.updates += 1;
                self.enqueue_dependents(id);
                true
            }
        }
    }

    /// The current, possibly partial, value of `query`.
    pub fn cached(&self, query: &E::Query) -> Option<&E::Value> {
        let id = self.queries.get_index_of(query)?;
        self.memo[id].as_ref()
    }

    pub fn is_stable(&self) -> bool {
        self.worklist.is_empty()
    }

    pub fn stats(&self) -> SolverStats {
        SolverStats {
            queries: self.queries.len(),
            ..self.stats
        }
    }

    /// The failure of `query`, if its computation or one it read failed.
    pub fn failure(&self, query: &E::Query) -> Option<&E::Error> {
        let id = self.queries.get_index_of(query)?;
        self.failures[id].as_ref()
    }

    /// Runs the worklist until every queued computation is stable or failed.
    pub fn drain(&mut self, equations: &mut E) {
        while let Some(id) = self.worklist.pop_front() {
            self.queued.set(id, false);
            if self.failures[id].is_some() {
                continue;
            }
            if let Err(error) = self.evaluate(equations, id) {
                self.fail(id, error);
            }
        }
    }

    fn intern(&mut self, query: E::Query) -> usize {
        let (id, inserted) = self.queries.insert_full(query);
        if inserted {
            self.memo.push(None);
            self.failures.push(None);
            self.dependents.push(FxHashSet::default());
        }
        id
    }

    /// Seeds a query that was never touched with bottom and queues it.
    fn seed(&mut self, id: usize) {
        if self.memo[id].is_none() {
            self.memo[id] = Some(E::Value::bottom_());
            self.enqueue(id);
        }
    }

    fn current_value(&self, id: usize) -> Result<E::Value, E::Error> {
        if let Some(error) = &self.failures[id] {
            return Err(error.clone());
        }
        Ok(self.memo[id].clone().unwrap_or_else(E::Value::bottom_))
    }

    /// Marks `id` and everything that transitively read it as failed.
    fn fail(&mut self, id: usize, error: E::Error) {
        debug!(query = ?self.queries[id], "computation failed");
        let mut pending = vec![id];
        while let Some(current) = pending.pop() {
            if self.failures[current].is_some() {
                continue;
            }
            self.failures[current] = Some(error.clone());
            pending.extend(self.dependents[current].iter().copied());
        }
    }

    fn enqueue(&mut self, id: usize) {
        if self.queued.len() <= id {
            self.queued.grow(self.queries.len().max(id + 1));
        }
        if !self.queued.put(id) {
            self.worklist.push_back(id);
        }
    }

    fn enqueue_dependents(&mut self, id: usize) {
        let dependents: Vec<_> = self.dependents[id].iter().copied().collect();
        for dependent in dependents {
            self.enqueue(dependent);
        }
    }

    fn evaluate(&mut self, equations: &mut E, id: usize) -> Result<(), E::Error> {
        let query = self.queries[id].clone();
        trace!(?query, "evaluating");
        self.stats.evaluations += 1;
        let value = {
            let mut fix = Fix {
                solver: self,
                current: id,
            };
            equations.evaluate(&query, &mut fix)?
        };
        let grew = match &mut self.memo[id] {
            Some(current) => current.join_assign_(&value),
            None => {
                self.memo[id] = Some(value);
                true
            }
        };
        if grew {
            debug!(?query, "memoized value grew");
            self.stats.updates += 1;
            self.enqueue_dependents(id);
        }
        Ok(())
    }
}

/// Handle given to a right-hand side while it is being evaluated. Every
/// query read through it becomes a dependency of the current computation.
pub struct Fix<'s, E: Equations> {
    solver: &'s mut FixpointSolver<E>,
    current: usize,
}

impl<E: Equations> Fix<'_, E> {
    /// The current value of `query`. A query that was never touched is
    /// seeded with bottom and queued: the reader sees bottom for now and is
    /// evaluated again once the value grows. Reading a failed query fails.
    pub fn run(&mut self, query: E::Query) -> Result<E::Value, E::Error> {
        let id = self.solver.intern(query);
        self.solver.dependents[id].insert(self.current);
        self.solver.seed(id);
        self.solver.current_value(id)
    }

    /// See [`FixpointSolver::push_cache`].
    pub fn push_cache(&mut self, query: E::Query, value: &E::Value) -> bool {
        self.solver.push_cache(query, value)
    }

    /// The query being evaluated.
    pub fn current(&self) -> &E::Query {
        &self.solver.queries[self.current]
    }
}
