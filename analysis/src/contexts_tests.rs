use super::contexts::*;
use proptest::prelude::*;

type Arena = ContextArena<u32, u32>;

fn chain(arena: &mut Arena, sites: &[u32], terminal: ContextId) -> ContextId {
    sites
        .iter()
        .rev()
        .fold(terminal, |tail, &site| arena.frame(site, tail))
}

fn render(arena: &Arena, id: ContextId) -> String {
    arena.render(id, &|s| format!("c{s}"), &|f| format!("f{f}"))
}

#[test]
fn structurally_equal_contexts_are_identical() {
    let mut arena = Arena::new();
    let bottom = arena.stack_bottom();
    let a = chain(&mut arena, &[1, 2], bottom);
    let b = chain(&mut arena, &[1, 2], bottom);
    let c = chain(&mut arena, &[2, 1], bottom);
    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_eq!(arena.question(7), arena.question(7));
    assert_ne!(arena.question(7), arena.question(8));
}

#[test]
fn push_respects_the_bound() {
    let mut arena = Arena::new();
    let bottom = arena.stack_bottom();

    assert_eq!(arena.push(1, bottom, 0), arena.limit());

    let one = arena.push(1, bottom, 1);
    assert_eq!(render(&arena, one), "c1 :: ()");

    let two = arena.push(2, one, 1);
    assert_eq!(render(&arena, two), "c2 :: *");

    let two = arena.push(2, one, 2);
    assert_eq!(render(&arena, two), "c2 :: c1 :: ()");
    assert_eq!(arena.depth(two), 2);
    assert_eq!(arena.sites(two), vec![2, 1]);
    assert_eq!(arena.terminal(two), bottom);
}

#[test]
fn truncate_keeps_short_chains() {
    let mut arena = Arena::new();
    let question = arena.question(3);
    let ctx = chain(&mut arena, &[1, 2], question);
    assert_eq!(arena.truncate(ctx, 2), ctx);
    assert_eq!(arena.truncate(ctx, 5), ctx);
    let cut = arena.truncate(ctx, 1);
    assert_eq!(render(&arena, cut), "c1 :: *");
    assert_eq!(arena.truncate(ctx, 0), arena.limit());
    assert_eq!(arena.truncate(question, 0), question);
}

#[test]
fn refinement() {
    let mut arena = Arena::new();
    let bottom = arena.stack_bottom();
    let limit = arena.limit();
    let question = arena.question(0);
    let c1 = chain(&mut arena, &[1], bottom);
    let c2 = chain(&mut arena, &[2], bottom);
    let c1_any = chain(&mut arena, &[1], limit);

    assert!(arena.refines(c1, question));
    assert!(arena.refines(c1, limit));
    assert!(arena.refines(c1, c1_any));
    assert!(arena.refines(c1, c1));
    assert!(!arena.refines(c1, c2));
    assert!(!arena.refines(c1_any, c1));
    assert!(!arena.refines(question, c1));
    assert!(!arena.refines(bottom, c1));
}

#[test]
fn environments() {
    let mut arena = Arena::new();
    let mut envs = EnvArena::new();
    let bottom = arena.stack_bottom();
    let call = arena.push(4, bottom, 1);
    let question = arena.question(9);

    let module = envs.intern(&[bottom]);
    assert_eq!(envs.intern(&[bottom]), module);

    let body = envs.cons(call, module);
    assert_eq!(envs.get(body), &[call, bottom]);
    assert_eq!(envs.head(body), call);
    assert_eq!(envs.depth(body), 2);

    let nested = envs.extend(&[question, question], module);
    assert_eq!(envs.depth(nested), 3);
    assert_eq!(envs.extend(&[], module), module);

    assert_eq!(envs.drop_inner(body, 1), module);
    assert_eq!(envs.drop_inner(body, 10), module);
    assert_eq!(envs.drop_inner(body, 0), body);

    let replaced = envs.replace(nested, 0, call);
    assert_eq!(envs.get(replaced), &[call, question, bottom]);
}

fn arb_sites() -> impl Strategy<Value = Vec<u32>> {
    prop::collection::vec(0u32..4, 0..6)
}

proptest! {
    #[test]
    fn push_never_exceeds_the_bound(sites in arb_sites(), m in 0usize..4) {
        let mut arena = Arena::new();
        let mut ctx = arena.stack_bottom();
        for site in sites {
            ctx = arena.push(site, ctx, m);
            prop_assert!(arena.depth(ctx) <= m);
        }
    }

    #[test]
    fn truncation_is_idempotent_and_coarser(sites in arb_sites(), m in 0usize..4) {
        let mut arena = Arena::new();
        let bottom = arena.stack_bottom();
        let ctx = chain(&mut arena, &sites, bottom);
        let cut = arena.truncate(ctx, m);
        prop_assert_eq!(arena.truncate(cut, m), cut);
        prop_assert!(arena.refines(ctx, cut));
    }

    #[test]
    fn interning_agrees_with_structure(a in arb_sites(), b in arb_sites()) {
        let mut arena = Arena::new();
        let bottom = arena.stack_bottom();
        let x = chain(&mut arena, &a, bottom);
        let y = chain(&mut arena, &b, bottom);
        prop_assert_eq!(x == y, a == b);
        prop_assert_eq!(arena.sites(x), a);
    }
}
