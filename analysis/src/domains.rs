use core::cmp::Ordering;
use core::fmt::Debug;
use core::hash::Hash;
use core::ops::{Deref, DerefMut};

use rustc_hash::FxHashSet;

/////////////////////////
// Traits for domains. //
/////////////////////////

/// A join semi-lattice is a partially ordered set where the least upper
/// bound exists for every finite subset. In a value-flow analysis the
/// ordering reads as "may denote more constructors": the set `{1, 2}` is a
/// safe approximation of `{1}`. Bottom is the least element and represents
/// "no value discovered (yet)".
pub trait JoinSemiLattice: Eq + PartialOrd + Clone + Debug {
    /// A type to hold some information about the lattice on the side.
    ///
    /// For some lattices we need to store the universe somewhere. When we
    /// need no such values, set this to unit.
    type LatticeContext;

    /// The unit element of the join operation. Fixpoint iteration starts
    /// every computation from this value.
    ///
    /// Required to be the smallest element according to the ordering.
    fn bottom(ctx: &Self::LatticeContext) -> Self;

    /// Computes the least upper bound of the arguments.
    ///
    /// Requirements:
    /// * Reflexive: a.join(a, ctx) == a
    /// * Commutative: a.join(b, ctx) == b.join(a, ctx)
    /// * Bottom is unit: bottom.join(b, ctx) == b
    /// * Upper bound: a.join(b, ctx) >= a and a.join(b, ctx) >= b
    /// * Ordering is respected: a <= b => a.join(b, ctx) == b
    fn join(&self, other: &Self, ctx: &Self::LatticeContext) -> Self;

    /// Joins `other` into `self` and reports whether `self` grew. Solvers
    /// use the flag to decide whether dependent computations must be
    /// revisited. Lattices with a cheaper in-place union should override it.
    fn join_assign(&mut self, other: &Self, ctx: &Self::LatticeContext) -> bool {
        let joined = self.join(other, ctx);
        if joined == *self {
            return false;
        }
        *self = joined;
        true
    }
}

pub trait JoinSemiLatticeNoContext: JoinSemiLattice {
    /// See [JoinSemiLattice::bottom] for details. This version does not
    /// require a context.
    fn bottom_() -> Self;

    /// See [JoinSemiLattice::join] for details. This version does not
    /// require a context.
    fn join_(&self, other: &Self) -> Self;

    /// See [JoinSemiLattice::join_assign] for details. This version does not
    /// require a context.
    fn join_assign_(&mut self, other: &Self) -> bool;
}

impl<L: JoinSemiLattice<LatticeContext = ()>> JoinSemiLatticeNoContext for L {
    fn bottom_() -> Self {
        <L as JoinSemiLattice>::bottom(&())
    }

    fn join_(&self, other: &Self) -> Self {
        self.join(other, &())
    }

    fn join_assign_(&mut self, other: &Self) -> bool {
        self.join_assign(other, &())
    }
}

/////////////////////////////////////
// Concrete domain implementations //
/////////////////////////////////////

/// Bool is a lattice, where false is bottom and true is top, join is or.
impl JoinSemiLattice for bool {
    type LatticeContext = ();

    fn bottom(_ctx: &Self::LatticeContext) -> Self {
        false
    }

    fn join(&self, other: &Self, _ctx: &Self::LatticeContext) -> Self {
        *self || *other
    }
}

/// In the power set lattice, the empty set is bottom and union is join.
/// There is no top: the universe of values a program can construct is only
/// discovered while solving, so the lattice needs no context either.
#[derive(PartialEq, Eq, Clone)]
pub struct PowerSet<T: Eq + Hash>(pub FxHashSet<T>);

impl<T: Eq + Hash> Default for PowerSet<T> {
    fn default() -> Self {
        Self(FxHashSet::default())
    }
}

impl<T: Eq + Hash> PowerSet<T> {
    pub fn singleton(value: T) -> Self {
        let mut result = Self::default();
        result.0.insert(value);
        result
    }
}

impl<T: Eq + Hash> Deref for PowerSet<T> {
    type Target = FxHashSet<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T: Eq + Hash> DerefMut for PowerSet<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl<T: Eq + Hash> FromIterator<T> for PowerSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<T: Eq + Hash> IntoIterator for PowerSet<T> {
    type Item = T;
    type IntoIter = std::collections::hash_set::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a, T: Eq + Hash> IntoIterator for &'a PowerSet<T> {
    type Item = &'a T;
    type IntoIter = std::collections::hash_set::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl<T: Eq + Hash> PartialOrd for PowerSet<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self.is_superset(other), other.is_superset(self)) {
            (true, true) => Some(Ordering::Equal),
            (true, false) => Some(Ordering::Greater),
            (false, true) => Some(Ordering::Less),
            (_, _) => None,
        }
    }
}

impl<T: Eq + Hash + Debug> Debug for PowerSet<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut elements: Box<[String]> = self.iter().map(|x| format!("{x:?}")).collect();
        elements.sort_unstable();
        write!(f, "{{{}}}", elements.join(", "))
    }
}

impl<T: Eq + Hash + Debug + Clone> JoinSemiLattice for PowerSet<T> {
    type LatticeContext = ();

    fn bottom(_: &Self::LatticeContext) -> Self {
        Self::default()
    }

    fn join(&self, other: &Self, _ctx: &Self::LatticeContext) -> Self {
        Self(self.union(other).cloned().collect())
    }

    fn join_assign(&mut self, other: &Self, _ctx: &Self::LatticeContext) -> bool {
        let before = self.len();
        self.extend(other.iter().cloned());
        self.len() != before
    }
}
