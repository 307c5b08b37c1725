use super::domains::*;
use super::fixpoint::*;
use itertools::Itertools;

/// Reachability in a directed graph: the value of a node is the set of nodes
/// reachable from it, including itself.
struct Reachability {
    edges: Vec<Vec<u32>>,
    fail_on: Option<u32>,
}

impl Reachability {
    fn new(edges: &[&[u32]]) -> Self {
        Self {
            edges: edges.iter().map(|succs| succs.to_vec()).collect(),
            fail_on: None,
        }
    }
}

impl Equations for Reachability {
    type Query = u32;
    type Value = PowerSet<u32>;
    type Error = String;

    fn evaluate(&mut self, node: &u32, fix: &mut Fix<'_, Self>) -> Result<PowerSet<u32>, String> {
        if self.fail_on == Some(*node) {
            return Err(format!("failed at {node}"));
        }
        assert_eq!(fix.current(), node);
        let mut result = PowerSet::singleton(*node);
        for succ in self.edges[*node as usize].clone() {
            result.join_assign_(&fix.run(succ)?);
        }
        Ok(result)
    }
}

fn sorted(set: &PowerSet<u32>) -> Vec<u32> {
    set.iter().copied().sorted().collect()
}

#[test]
fn acyclic() {
    let mut eqs = Reachability::new(&[&[1, 2], &[3], &[3], &[]]);
    let mut solver = FixpointSolver::new();
    let result = solver.value_of(&mut eqs, 0).unwrap();
    assert_eq!(sorted(&result), vec![0, 1, 2, 3]);
    assert_eq!(sorted(solver.cached(&1).unwrap()), vec![1, 3]);
    assert!(solver.is_stable());
}

#[test]
fn cycles_converge() {
    // 0 -> 1 -> 2 -> 0, 2 -> 3
    let mut eqs = Reachability::new(&[&[1], &[2], &[0, 3], &[]]);
    let mut solver = FixpointSolver::new();
    let result = solver.value_of(&mut eqs, 0).unwrap();
    assert_eq!(sorted(&result), vec![0, 1, 2, 3]);
    for node in 0..3 {
        let value = solver.value_of(&mut eqs, node).unwrap();
        assert_eq!(sorted(&value), vec![0, 1, 2, 3]);
    }
    let value = solver.value_of(&mut eqs, 3).unwrap();
    assert_eq!(sorted(&value), vec![3]);
}

#[test]
fn self_loop() {
    let mut eqs = Reachability::new(&[&[0]]);
    let mut solver = FixpointSolver::new();
    let result = solver.value_of(&mut eqs, 0).unwrap();
    assert_eq!(sorted(&result), vec![0]);
}

#[test]
fn solved_queries_are_not_evaluated_again() {
    let mut eqs = Reachability::new(&[&[1], &[2], &[0]]);
    let mut solver = FixpointSolver::new();
    let first = solver.value_of(&mut eqs, 0).unwrap();
    let stats = solver.stats();
    let second = solver.value_of(&mut eqs, 0).unwrap();
    assert_eq!(first, second);
    assert_eq!(solver.stats(), stats);
    assert_eq!(stats.queries, 3);
}

#[test]
fn push_cache_joins_and_notifies_readers() {
    let mut eqs = Reachability::new(&[&[1], &[], &[]]);
    let mut solver = FixpointSolver::new();
    let before = solver.value_of(&mut eqs, 0).unwrap();
    assert_eq!(sorted(&before), vec![0, 1]);

    // Facts about node 1 discovered elsewhere flow into its readers.
    assert!(solver.push_cache(1, &PowerSet::singleton(2)));
    assert!(!solver.push_cache(1, &PowerSet::singleton(2)));
    let after = solver.value_of(&mut eqs, 0).unwrap();
    assert_eq!(sorted(&after), vec![0, 1, 2]);

    // Pushed facts are never lost by a later evaluation.
    let node = solver.value_of(&mut eqs, 1).unwrap();
    assert_eq!(sorted(&node), vec![1, 2]);
}

#[test]
fn push_cache_on_untouched_query_still_evaluates_it() {
    let mut eqs = Reachability::new(&[&[1], &[]]);
    let mut solver = FixpointSolver::new();
    assert!(solver.push_cache(0, &PowerSet::singleton(5)));
    let result = solver.value_of(&mut eqs, 0).unwrap();
    assert_eq!(sorted(&result), vec![0, 1, 5]);
}

#[test]
fn errors_propagate() {
    let mut eqs = Reachability::new(&[&[1], &[2], &[]]);
    eqs.fail_on = Some(2);
    let mut solver = FixpointSolver::new();
    assert_eq!(solver.value_of(&mut eqs, 0), Err("failed at 2".to_owned()));
    // Asking again reports the failure instead of a partial value.
    assert_eq!(solver.value_of(&mut eqs, 0), Err("failed at 2".to_owned()));
    assert_eq!(solver.value_of(&mut eqs, 1), Err("failed at 2".to_owned()));
    assert_eq!(solver.failure(&2), Some(&"failed at 2".to_owned()));
    assert!(!solver.push_cache(1, &PowerSet::singleton(7)));
}

#[test]
fn failures_do_not_leak_into_unrelated_queries() {
    let mut eqs = Reachability::new(&[&[1], &[], &[3], &[]]);
    eqs.fail_on = Some(1);
    let mut solver = FixpointSolver::new();
    assert!(solver.value_of(&mut eqs, 0).is_err());
    let result = solver.value_of(&mut eqs, 2).unwrap();
    assert_eq!(sorted(&result), vec![2, 3]);
    assert_eq!(solver.failure(&2), None);
}

/// Whether the last node of a chain is reachable: node `i` reads node
/// `i + 1`.
struct ReachesEnd {
    len: u32,
}

impl Equations for ReachesEnd {
    type Query = u32;
    type Value = bool;
    type Error = ();

    fn evaluate(&mut self, node: &u32, fix: &mut Fix<'_, Self>) -> Result<bool, ()> {
        if *node + 1 == self.len {
            return Ok(true);
        }
        fix.run(node + 1)
    }
}

#[test]
fn long_dependency_chains_do_not_grow_the_stack() {
    let mut eqs = ReachesEnd { len: 200_000 };
    let mut solver = FixpointSolver::new();
    assert_eq!(solver.value_of(&mut eqs, 0), Ok(true));
    assert_eq!(solver.cached(&100_000), Some(&true));
    assert!(solver.is_stable());
    assert_eq!(solver.stats().queries, 200_000);
}
