use crate::{
    ast::{AssignOp, FunctionFlags, ImportKind, LogicalOp, NodeKind, PropKey},
    program::normalize_path,
    test_utils::*,
};

fn kind_name(kind: &NodeKind) -> &'static str {
    match kind {
        NodeKind::If { .. } => "if",
        NodeKind::While { .. } => "while",
        NodeKind::For { .. } => "for",
        NodeKind::ForOf { is_in: false, .. } => "for-of",
        NodeKind::ForOf { is_in: true, .. } => "for-in",
        NodeKind::Try { .. } => "try",
        NodeKind::Template { .. } => "template",
        NodeKind::New { .. } => "new",
        NodeKind::Spread { .. } => "spread",
        NodeKind::Conditional { .. } => "conditional",
        NodeKind::Await { .. } => "await",
        NodeKind::Update { .. } => "update",
        _ => "",
    }
}

#[test]
fn test_empty_module() {
    let program = parse_string("").unwrap();
    let ast = program.ast();
    let module = program.module_by_path("main.js").unwrap();
    let root = program.root(module);
    assert_eq!(ast.kind(root), &NodeKind::Module { body: vec![] });
    assert_eq!(ast.len(), 1);
}

#[test]
fn test_function_flags() {
    let source = "\
const f = async (a, b) => a;
function g() {}
const h = function () { return 1; };
const k = x => { return x; };
async function l() {}
";
    let program = parse_string(source).unwrap();
    let ast = program.ast();

    let f = function_named(&program, "f");
    assert_eq!(
        ast.function_flags(f),
        Some(FunctionFlags {
            is_arrow: true,
            is_async: true,
            is_declaration: false,
            expression_body: true,
        })
    );
    let g = function_named(&program, "g");
    assert_eq!(
        ast.function_flags(g),
        Some(FunctionFlags {
            is_declaration: true,
            ..FunctionFlags::default()
        })
    );
    let h = function_named(&program, "h");
    assert_eq!(ast.function_flags(h), Some(FunctionFlags::default()));
    let k = function_named(&program, "k");
    assert_eq!(
        ast.function_flags(k),
        Some(FunctionFlags {
            is_arrow: true,
            ..FunctionFlags::default()
        })
    );
    let l = function_named(&program, "l");
    assert_eq!(
        ast.function_flags(l),
        Some(FunctionFlags {
            is_async: true,
            is_declaration: true,
            ..FunctionFlags::default()
        })
    );
    assert_eq!(ast.text(f), "async (a, b) => a");
    assert_eq!(ast.returned_values(f), vec![node(&program, "a", 1)]);
}

#[test]
fn test_statements_and_expressions() {
    let source = "\
let total = 0;
const items = [1, 2, ...rest];
if (total > 1) total++; else total = -1;
while (total < 10) { total += 2; break; }
for (let i = 0; i < 3; i++) { continue; }
for (const item of items) {}
for (const key in obj) {}
try { risky(); } catch { } finally { done(); }
const label = `a${total}b`;
const made = new Date(total);
const deep = obj?.inner?.(1) ?? fallback;
const pick = total ? 1 : 2;
async function run() { await made; }
";
    let program = parse_string(source).unwrap();
    let ast = program.ast();
    let mut kinds: Vec<&str> = ast
        .node_ids()
        .map(|node| kind_name(ast.kind(node)))
        .filter(|name| !name.is_empty())
        .collect();
    kinds.sort();
    assert_eq!(
        kinds,
        vec![
            "await",
            "conditional",
            "for",
            "for-in",
            "for-of",
            "if",
            "new",
            "spread",
            "template",
            "try",
            "update",
            "update",
            "while",
        ]
    );

    let template = node(&program, "`a${total}b`", 0);
    let NodeKind::Template { quasis, exprs } = ast.kind(template) else {
        panic!("expected a template");
    };
    let quasis: Vec<&str> = quasis.iter().map(|sym| ast.name(*sym)).collect();
    assert_eq!(quasis, vec!["a", "b"]);
    assert_eq!(exprs.len(), 1);

    let coalesce = node(&program, "obj?.inner?.(1) ?? fallback", 0);
    let NodeKind::Logical { op, lhs, .. } = ast.kind(coalesce) else {
        panic!("expected a logical expression");
    };
    assert_eq!(*op, LogicalOp::Nullish);
    assert!(matches!(ast.kind(*lhs), NodeKind::Call { optional: true, .. }));
}

#[test]
fn test_objects_and_patterns() {
    let source = "\
const o = { a, b: 2, [k]: 3, m() { return 4; } };
[x, y = 1, ...zs] = list;
({ p, q: { r } } = o);
const { s, ...others } = o;
";
    let program = parse_string(source).unwrap();
    let ast = program.ast();

    let object = node(&program, "{ a, b: 2, [k]: 3, m() { return 4; } }", 0);
    let NodeKind::Object { properties } = ast.kind(object) else {
        panic!("expected an object literal");
    };
    assert_eq!(properties.len(), 4);
    assert!(matches!(
        ast.kind(properties[0]),
        NodeKind::Property { shorthand: true, .. }
    ));
    assert!(matches!(
        ast.kind(properties[2]),
        NodeKind::Property {
            key: PropKey::Computed(_),
            ..
        }
    ));
    let method = function_named(&program, "m");
    assert_eq!(ast.parent(method), Some(properties[3]));

    let array = node(&program, "[x, y = 1, ...zs]", 0);
    let NodeKind::ArrayPattern { elements } = ast.kind(array) else {
        panic!("expected an array pattern, got {:?}", ast.kind(array));
    };
    assert!(matches!(
        ast.kind(elements[1].unwrap()),
        NodeKind::AssignPattern { .. }
    ));
    assert!(matches!(ast.kind(elements[2].unwrap()), NodeKind::Rest { .. }));
    let NodeKind::Assign { op, .. } = ast.kind(ast.parent(array).unwrap()) else {
        panic!("expected an assignment");
    };
    assert_eq!(*op, AssignOp::Assign);

    let nested = node(&program, "{ p, q: { r } }", 0);
    assert!(matches!(ast.kind(nested), NodeKind::ObjectPattern { .. }));
    let inner = node(&program, "{ r }", 0);
    assert!(matches!(ast.kind(inner), NodeKind::ObjectPattern { .. }));

    let rest = node(&program, "...others", 0);
    assert!(matches!(ast.kind(rest), NodeKind::Rest { .. }));
}

#[test]
fn test_imports_and_exports() {
    let source = "\
import def, { a as b, c } from './lib.js';
import * as ns from 'pkg';
export const v = 1;
export { b as renamed };
export default function () {}
";
    let program = parse_string(source).unwrap();
    let ast = program.ast();
    let kinds: Vec<ImportKind> = ast
        .node_ids()
        .filter_map(|node| match ast.kind(node) {
            NodeKind::ImportSpecifier { kind, .. } => Some(*kind),
            _ => None,
        })
        .collect();
    assert_eq!(kinds.len(), 4);
    assert_eq!(kinds[0], ImportKind::Default);
    assert!(matches!(kinds[1], ImportKind::Named(sym) if ast.name(sym) == "a"));
    assert!(matches!(kinds[2], ImportKind::Named(sym) if ast.name(sym) == "c"));
    assert_eq!(kinds[3], ImportKind::Namespace);

    let sources: Vec<&str> = ast
        .node_ids()
        .filter_map(|node| match ast.kind(node) {
            NodeKind::Import { source, .. } => Some(ast.name(*source)),
            _ => None,
        })
        .collect();
    assert_eq!(sources, vec!["./lib.js", "pkg"]);

    let defaults = ast
        .node_ids()
        .filter(|&node| matches!(ast.kind(node), NodeKind::ExportDefault { .. }))
        .count();
    assert_eq!(defaults, 1);
}

#[test]
fn test_automatic_semicolons() {
    let program = parse_string("let a = 1\nlet b = a\nb\n").unwrap();
    let ast = program.ast();
    let module = program.module_by_path("main.js").unwrap();
    let NodeKind::Module { body } = ast.kind(program.root(module)) else {
        panic!("expected a module");
    };
    assert_eq!(body.len(), 3);
    assert_eq!(ast.line(body[2]), 3);
}

#[test]
fn test_labels() {
    let program = parse_string("const s = f(1,\n    2);").unwrap();
    let ast = program.ast();
    let call = node(&program, "f(1,\n    2)", 0);
    assert_eq!(ast.label(call), "f(1, 2)");
    assert_eq!(ast.line(call), 1);

    let long = format!("const t = g({});", "1 + ".repeat(20) + "1");
    let program = parse_string(&long).unwrap();
    let ast = program.ast();
    let call = ast
        .node_ids()
        .find(|&node| ast.is_call(node))
        .unwrap();
    let label = ast.label(call);
    assert_eq!(label.len(), 48);
    assert!(label.starts_with("g(1 + 1 + "));
    assert!(label.ends_with("..."));
}

#[test]
fn test_parse_errors() {
    assert_eq!(
        parse_errors("const = 1;"),
        "[line 1] Error at '=': Identifier expected.\n"
    );
    assert_eq!(
        parse_errors("f(1"),
        "[line 1] Error at end of file: ')' expected.\n"
    );
    assert_eq!(
        parse_errors("1 = 2;"),
        "[line 1] Error at '=': Invalid assignment target.\n"
    );
    assert_eq!(
        parse_errors("[a, 1] = b;"),
        "[line 1] Error: Invalid assignment target.\n"
    );
    assert_eq!(
        parse_errors("let a = 1\ntry {}"),
        "[line 2] Error at end of file: Expect 'catch' or 'finally' after try block.\n"
    );
    assert_eq!(
        parse_errors("function () {}"),
        "[line 1] Error at '(': Function name expected.\n"
    );
    assert_eq!(
        parse_errors("let a = 1 2"),
        "[line 1] Error at '2': ';' expected.\n"
    );
}

#[test]
fn test_every_module_reports_errors() {
    let errors = parse_modules(&[("a.js", "let = 1;"), ("b.js", "x y")]).unwrap_err();
    assert_eq!(
        errors,
        "[line 1] Error at '=': Identifier expected.\n[line 1] Error at 'y': ';' expected.\n"
    );
}

#[test]
fn test_normalize_path() {
    assert_eq!(normalize_path("src/./db.js"), "src/db");
    assert_eq!(normalize_path("src/lib/../db"), "src/db");
    assert_eq!(normalize_path("src\\util.ts"), "src/util");
    assert_eq!(normalize_path("../up/x.mjs"), "../up/x");
}
