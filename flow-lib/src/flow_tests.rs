use crate::{
    cursor::{Config, ConfigSet, Cursor, Query, QueryKind},
    session::{AnalysisError, Diagnostic, FlowOptions, FlowSession},
    test_utils::*,
};

#[test]
fn constants_flow_through_variables() {
    let program = parse_string("const x = 1;\nconst y = x;").unwrap();
    let mut session = session(&program, 1);
    assert_eq!(values_of(&mut session, "x", 1), strings(&["1"]));
    assert_eq!(values_of(&mut session, "y", 0), strings(&["1"]));
}

const IDENTITY: &str = "\
function f(x) { return x; }
const a = f(2);
const b = f(3);
";

#[test]
fn call_sites_are_separated() {
    let program = parse_string(IDENTITY).unwrap();
    let mut session = session(&program, 1);
    assert_eq!(values_of(&mut session, "f(2)", 0), strings(&["2"]));
    assert_eq!(values_of(&mut session, "f(3)", 0), strings(&["3"]));
    assert_eq!(values_of(&mut session, "a", 0), strings(&["2"]));
}

#[test]
fn no_context_merges_call_sites() {
    let program = parse_string(IDENTITY).unwrap();
    let mut session = session(&program, 0);
    assert_eq!(values_of(&mut session, "f(2)", 0), strings(&["2", "3"]));
    assert_eq!(values_of(&mut session, "f(3)", 0), strings(&["2", "3"]));
}

#[test]
fn parameters_at_top_level_see_every_caller() {
    let program = parse_string(IDENTITY).unwrap();
    let mut session = session(&program, 1);
    assert_eq!(values_of(&mut session, "x", 1), strings(&["2", "3"]));

    // Asking about a call first does not lose the other caller.
    let program = parse_string(IDENTITY).unwrap();
    let mut session = super::test_utils::session(&program, 1);
    assert_eq!(values_of(&mut session, "f(3)", 0), strings(&["3"]));
    assert_eq!(values_of(&mut session, "x", 1), strings(&["2", "3"]));
}

#[test]
fn builtin_callbacks_receive_elements() {
    let program = parse_string("const ys = [1, 2, 3].map(v => v);\nconst first = ys[0];").unwrap();
    let mut session = session(&program, 1);
    assert_eq!(values_of(&mut session, "v", 1), strings(&["1", "2", "3"]));
    assert_eq!(values_of(&mut session, "ys[0]", 0), strings(&["1", "2", "3"]));
}

#[test]
fn mapped_callbacks_run_on_each_element() {
    let program = parse_string("const doubled = [1, 2, 3].map(n => n * 2);\ndoubled[0];").unwrap();
    let mut session = session(&program, 1);
    assert_eq!(values_of(&mut session, "n", 1), strings(&["1", "2", "3"]));
    assert_eq!(values_of(&mut session, "doubled[0]", 0), strings(&["n * 2"]));
    assert_eq!(values_of(&mut session, "doubled", 1), strings(&["[1, 2, 3].map(n => n * 2)"]));
}

#[test]
fn long_alias_chains_are_solved() {
    let mut source = "const x0 = 1;\n".to_owned();
    for i in 1..5000 {
        source.push_str(&format!("const x{i} = x{};\n", i - 1));
    }
    source.push_str("const last = x4999;\n");
    let program = parse_string(&source).unwrap();
    let mut session = session(&program, 1);
    assert_eq!(values_of(&mut session, "x4999", 1), strings(&["1"]));
}

#[test]
fn call_chains_deeper_than_m_merge_callers() {
    let mut source = String::new();
    for i in 0..6 {
        source.push_str(&format!("function f{i}(x) {{ return f{}(x); }}\n", i + 1));
    }
    source.push_str("function f6(x) { return x; }\nconst a = f0(1);\nconst b = f0(2);\n");
    let program = parse_string(&source).unwrap();
    for m in 1..3 {
        let mut session = session(&program, m);
        assert_eq!(values_of(&mut session, "f0(1)", 0), strings(&["1", "2"]));
    }
    let mut session = session(&program, 7);
    assert_eq!(values_of(&mut session, "f0(1)", 0), strings(&["1"]));
    assert_eq!(values_of(&mut session, "f0(2)", 0), strings(&["2"]));
}

#[test]
fn mutual_recursion_terminates() {
    let source = "\
function even(n) { return n ? odd(n) : true; }
function odd(n) { return n ? even(n) : false; }
const r = even(1);
";
    let program = parse_string(source).unwrap();
    for m in 0..3 {
        let mut session = session(&program, m);
        assert_eq!(values_of(&mut session, "even(1)", 0), strings(&["false", "true"]));
    }
}

#[test]
fn unbounded_recursion_has_no_values() {
    let program = parse_string("function loop(n) { return loop(n); }\nloop(1);").unwrap();
    let mut session = session(&program, 2);
    assert!(values_of(&mut session, "loop(1)", 0).is_empty());
}

#[test]
fn answers_are_memoized() {
    let program = parse_string(IDENTITY).unwrap();
    let mut session = session(&program, 1);
    let first = values_of(&mut session, "f(2)", 0);
    let stats = session.stats();
    assert!(stats.evaluations > 0);
    let second = values_of(&mut session, "f(2)", 0);
    assert_eq!(first, second);
    assert_eq!(session.stats(), stats);
}

#[test]
fn pushed_facts_only_grow() {
    let program = parse_string("const x = 1;\nconst y = x;").unwrap();
    let mut session = session(&program, 1);
    let node = node(&program, "x", 1);
    let config = session.top_level(node);
    let values = session.evaluate(config).unwrap();

    let query = Query::new(QueryKind::Evaluate, config);
    assert!(!session.push_cache(query, &values));

    let external = ConfigSet::singleton(Config::new(Cursor::External, session.root()));
    assert!(session.push_cache(query, &external));
    assert_eq!(labels(&mut session, config), strings(&["1", "<external>"]));
}

#[test]
fn traced_follows_aliases() {
    let program = parse_string("const a = 1;\nconst b = a;\nconst c = b;").unwrap();
    let mut session = session(&program, 1);
    let one = node(&program, "1", 0);
    let config = session.top_level(one);
    let traced = session.traced(config).unwrap();
    assert_eq!(session.label_set(&traced), strings(&["1", "a", "b"]));
}

#[test]
fn applied_and_callers() {
    let source = "\
function f(x) { return x; }
f(2);
const g = f;
g(3);
";
    let program = parse_string(source).unwrap();
    let mut session = session(&program, 1);
    let function = function_named(&program, "f");

    let config = session.top_level(function);
    let applied = session.applied(config).unwrap();
    assert_eq!(session.label_set(&applied), strings(&["f(2)", "g(3)"]));

    let body = session.top_level(node(&program, "x", 1)).env;
    let callers = session.callers(Config::new(function, body)).unwrap();
    assert_eq!(session.label_set(&callers), strings(&["f(2)", "g(3)"]));
}

#[test]
fn rest_parameters_collect_arguments() {
    let program = parse_string("function pick(...xs) { return xs[1]; }\nconst r = pick(1, 2, 3);").unwrap();
    let mut session = session(&program, 1);
    assert_eq!(values_of(&mut session, "pick(1, 2, 3)", 0), strings(&["2"]));
    assert_eq!(values_of(&mut session, "xs", 1), strings(&["args(pick(1, 2, 3))[0..]"]));
}

#[test]
fn imports_resolve_across_modules() {
    let lib = "\
export function g(a) { return a; }
export default function (b) { return b; }
";
    let main = "\
import h, { g } from './lib.js';
const v = g(5);
const w = h(7);
";
    let program = parse_modules(&[("lib.js", lib), ("main.js", main)]).unwrap();
    let mut session = session(&program, 1);
    assert_eq!(values_of(&mut session, "g(5)", 0), strings(&["5"]));
    assert_eq!(values_of(&mut session, "h(7)", 0), strings(&["7"]));

    let param = node_in(&program, "lib.js", "a", 1);
    let config = session.top_level(param);
    assert_eq!(labels(&mut session, config), strings(&["5"]));
}

#[test]
fn destructuring() {
    let source = "\
const obj = { a: 1, b: 2 };
const { a, b: c } = obj;
const [p, q] = [3, 4];
function h({ k = 9 }) { return k; }
const r = h({});
const s = h({ k: 1 });
";
    let program = parse_string(source).unwrap();
    let mut session = session(&program, 1);
    assert_eq!(values_of(&mut session, "a", 0), strings(&["1"]));
    assert_eq!(values_of(&mut session, "c", 0), strings(&["2"]));
    assert_eq!(values_of(&mut session, "p", 0), strings(&["3"]));
    assert_eq!(values_of(&mut session, "q", 0), strings(&["4"]));
    assert_eq!(values_of(&mut session, "h({})", 0), strings(&["9"]));
    assert_eq!(values_of(&mut session, "h({ k: 1 })", 0), strings(&["1", "9"]));
}

#[test]
fn loops_bind_elements() {
    let program = parse_string("const items = [5, 6];\nfor (const it of items) { it; }").unwrap();
    let mut session = session(&program, 1);
    assert_eq!(values_of(&mut session, "it", 1), strings(&["5", "6"]));
}

#[test]
fn catch_sees_thrown_values() {
    let source = "\
function fail() { throw 'boom'; }
let caught;
try { fail(); } catch (e) { caught = e; }
";
    let program = parse_string(source).unwrap();
    let mut session = session(&program, 1);
    assert_eq!(values_of(&mut session, "e", 1), strings(&["'boom'", "<external>"]));
    assert_eq!(values_of(&mut session, "caught", 1), strings(&["'boom'", "<external>"]));
}

#[test]
fn await_unwraps_promises() {
    let source = "\
async function load() { return 5; }
const p = Promise.resolve(3);
async function main() {
  const v = await load();
  const w = await p;
  return v;
}
";
    let program = parse_string(source).unwrap();
    let mut session = session(&program, 1);
    assert_eq!(values_of(&mut session, "load()", 0), strings(&["load()"]));
    assert_eq!(values_of(&mut session, "await load()", 0), strings(&["5"]));
    assert_eq!(values_of(&mut session, "await p", 0), strings(&["3"]));
}

#[test]
fn objects_collect_stored_properties() {
    let source = "\
const target = {};
Object.assign(target, { a: 1 });
const o = {};
o.x = 4;
const arr = [];
arr.push(7);
const first = arr[0];
";
    let program = parse_string(source).unwrap();
    let mut session = session(&program, 1);
    assert_eq!(values_of(&mut session, "target", 0), strings(&["{}"]));
    let read = node(&program, "target", 1);
    let config = session.top_level(read);
    let values = session.evaluate(config).unwrap();
    let property = session.label_set(&values);
    assert_eq!(property, strings(&["{}"]));

    let program = parse_string(&format!("{source}const out = target.a;\nconst ox = o.x;")).unwrap();
    let mut session = super::test_utils::session(&program, 1);
    assert_eq!(values_of(&mut session, "target.a", 0), strings(&["1"]));
    assert_eq!(values_of(&mut session, "o.x", 1), strings(&["4"]));
    assert_eq!(values_of(&mut session, "arr[0]", 0), strings(&["7"]));
}

#[test]
fn map_get_returns_stored_values() {
    let source = "\
const m = new Map();
m.set('k', 10);
const got = m.get('k');
";
    let program = parse_string(source).unwrap();
    let mut session = session(&program, 1);
    assert_eq!(values_of(&mut session, "m.get('k')", 0), strings(&["10"]));
    assert_eq!(values_of(&mut session, "m", 0), strings(&["new Map()"]));
}

#[test]
fn unknown_names_are_external() {
    let program = parse_string("const a = 1;\nunknown;\nJSON.parse('1');").unwrap();
    let mut session = session(&program, 1);
    assert_eq!(values_of(&mut session, "unknown", 0), strings(&["<external>"]));
    assert_eq!(values_of(&mut session, "JSON.parse('1')", 0), strings(&["<external>"]));
}

#[test]
fn bind_without_declaration_fails() {
    let program = parse_string("const a = 1;\nunknown;").unwrap();
    let mut session = session(&program, 1);
    let config = session.top_level(node(&program, "unknown", 0));
    assert_eq!(
        session.bind(config),
        Err(AnalysisError::MissingDeclaration {
            line: 2,
            label: "unknown".to_owned(),
        })
    );
}

#[test]
fn failed_queries_keep_failing() {
    let program = parse_string("const a = 1;\nunknown;").unwrap();
    let mut session = session(&program, 1);
    let config = session.top_level(node(&program, "unknown", 0));
    let first = session.bind(config);
    assert!(first.is_err());
    assert_eq!(session.bind(config), first);
    assert_eq!(values_of(&mut session, "a", 0), strings(&["1"]));
}

#[test]
fn unsupported_constructs_are_reported() {
    let program = parse_string("const z = 1 | 2;\nconst y = z;").unwrap();
    let mut session = session(&program, 1);
    assert!(values_of(&mut session, "y", 0).is_empty());
    let diagnostics = session.drain_diagnostics();
    assert_eq!(
        diagnostics,
        vec![Diagnostic {
            line: 1,
            label: "1 | 2".to_owned(),
            message: "Bitwise operators are not modeled.".to_owned(),
        }]
    );
    assert_eq!(
        diagnostics[0].to_string(),
        "[line 1] Unsupported '1 | 2': Bitwise operators are not modeled."
    );
    assert!(session.drain_diagnostics().is_empty());
}

#[test]
fn target_functions_have_unknown_arguments() {
    let program = parse_string(IDENTITY).unwrap();
    let function = function_named(&program, "f");
    let mut session = FlowSession::new(
        &program,
        FlowOptions {
            m: 1,
            targets: vec![function],
        },
    );
    assert_eq!(values_of(&mut session, "x", 1), strings(&["<external>"]));
}

#[test]
fn environments_render_contexts() {
    let program = parse_string(IDENTITY).unwrap();
    let mut session = session(&program, 1);
    let config = session.top_level(node(&program, "x", 1));
    assert_eq!(session.describe(config), "x <?f | ()>");
    assert_eq!(session.render_env(session.root()), "<()>");
}

#[test]
fn methods_see_their_receiver() {
    let source = "\
const counter = { step: 1, next() { return this.step; } };
const s = counter.next();
";
    let program = parse_string(source).unwrap();
    let mut session = session(&program, 1);
    assert_eq!(values_of(&mut session, "counter.next()", 0), strings(&["1"]));
}
