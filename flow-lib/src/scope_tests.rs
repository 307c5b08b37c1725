use crate::{
    ast::{DeclKind, NodeKind},
    scope::{BindingKind, DeclId, ImportTarget},
    program::Program,
    test_utils::*,
};

fn decl_at(program: &Program, text: &str, nth: usize) -> DeclId {
    let node = node(program, text, nth);
    program
        .scopes()
        .symbol_at(node)
        .unwrap_or_else(|| panic!("`{text}` has no declaration"))
}

#[test]
fn test_block_shadowing() {
    let program = parse_string("let x = 1;\n{ let x = 2; x; }\nx;").unwrap();
    let scopes = program.scopes();
    let outer = decl_at(&program, "x", 0);
    let inner = decl_at(&program, "x", 1);
    assert_ne!(outer, inner);
    assert_eq!(decl_at(&program, "x", 2), inner);
    assert_eq!(decl_at(&program, "x", 3), outer);

    assert_eq!(scopes.find_references(outer), &[node(&program, "x", 3)]);
    assert_eq!(scopes.find_references(inner), &[node(&program, "x", 2)]);
    assert!(matches!(
        program.ast().kind(scopes.declaring_scope(inner)),
        NodeKind::Block { .. }
    ));
    assert_eq!(
        scopes.decl(outer).kind,
        BindingKind::Variable(DeclKind::Let)
    );
}

#[test]
fn test_var_is_function_scoped() {
    let program =
        parse_string("function f() { if (true) { var v = 1; } return v; }\nv;").unwrap();
    let scopes = program.scopes();
    let v = decl_at(&program, "v", 0);
    assert_eq!(decl_at(&program, "v", 1), v);
    assert_eq!(scopes.declaring_scope(v), function_named(&program, "f"));
    assert_eq!(scopes.decl(v).kind, BindingKind::Variable(DeclKind::Var));
    // Outside of the function the name is undeclared.
    assert_eq!(scopes.symbol_at(node(&program, "v", 2)), None);
}

#[test]
fn test_function_and_parameter_scopes() {
    let source = "\
function outer(a, { b }) { return a + b; }
const g = function inner() { return inner; };
try { outer(1, {}); } catch (e) { e; }
";
    let program = parse_string(source).unwrap();
    let ast = program.ast();
    let scopes = program.scopes();
    let module = program.root(program.module_by_path("main.js").unwrap());

    let outer = decl_at(&program, "outer", 0);
    assert_eq!(scopes.decl(outer).kind, BindingKind::Function);
    assert_eq!(scopes.declaring_scope(outer), module);
    assert_eq!(scopes.find_references(outer), &[node(&program, "outer", 1)]);

    let function = function_named(&program, "outer");
    for name in ["a", "b"] {
        let param = decl_at(&program, name, 0);
        assert_eq!(scopes.decl(param).kind, BindingKind::Parameter);
        assert_eq!(scopes.declaring_scope(param), function);
        assert_eq!(decl_at(&program, name, 1), param);
    }

    // A named function expression sees its own name, the module does not.
    let inner = decl_at(&program, "inner", 0);
    assert_eq!(scopes.declaring_scope(inner), function_named(&program, "inner"));
    assert_eq!(decl_at(&program, "inner", 1), inner);

    let e = decl_at(&program, "e", 0);
    assert_eq!(scopes.decl(e).kind, BindingKind::CatchParameter);
    assert!(matches!(
        ast.kind(scopes.declaring_scope(e)),
        NodeKind::Catch { .. }
    ));
    assert_eq!(decl_at(&program, "e", 1), e);
}

#[test]
fn test_imports_resolve_against_exports() {
    let lib = "\
export function g(a) { return a; }
export default 42;
export { g as alias };
";
    let main = "\
import d, { g, alias, missing } from './lib.js';
import * as ns from './lib.js';
import pkg from 'pkg';
";
    let program = parse_modules(&[("lib.js", lib), ("main.js", main)]).unwrap();
    let ast = program.ast();
    let scopes = program.scopes();
    let lib_module = program.module_by_path("lib.js").unwrap();
    let lib_decl = |text: &str| {
        scopes
            .symbol_at(node_in(&program, "lib.js", text, 0))
            .unwrap()
    };
    let g = lib_decl("g");
    let answer = node_in(&program, "lib.js", "42", 0);

    assert_eq!(scopes.resolve_import(decl_at(&program, "d", 0)), ImportTarget::Expression(answer));
    assert_eq!(scopes.resolve_import(decl_at(&program, "g", 0)), ImportTarget::Decl(g));
    assert_eq!(scopes.resolve_import(decl_at(&program, "alias", 0)), ImportTarget::Decl(g));
    assert_eq!(scopes.resolve_import(decl_at(&program, "missing", 0)), ImportTarget::External);
    assert_eq!(
        scopes.resolve_import(decl_at(&program, "ns", 0)),
        ImportTarget::Namespace(lib_module)
    );
    assert_eq!(scopes.resolve_import(decl_at(&program, "pkg", 0)), ImportTarget::External);
    assert_eq!(scopes.decl(decl_at(&program, "pkg", 0)).kind, BindingKind::Import);

    assert_eq!(
        scopes.importers(ImportTarget::Decl(g)),
        &[decl_at(&program, "g", 0), decl_at(&program, "alias", 0)]
    );
    assert!(scopes.importers(ImportTarget::Decl(lib_decl("a"))).is_empty());

    assert_eq!(scopes.export_of(ast, lib_module, "alias"), ImportTarget::Decl(g));
    assert_eq!(scopes.export_of(ast, lib_module, "g"), ImportTarget::Decl(g));
    assert_eq!(
        scopes.export_of(ast, lib_module, "default"),
        ImportTarget::Expression(answer)
    );
    assert_eq!(scopes.export_of(ast, lib_module, "nothing"), ImportTarget::External);
}

#[test]
fn test_reexports_are_followed() {
    let db = "export const conn = 1;\n";
    let index = "export { conn as db } from './db';\n";
    let main = "import { db } from './lib';\n";
    let program = parse_modules(&[
        ("lib/db.js", db),
        ("lib/index.js", index),
        ("main.js", main),
    ])
    .unwrap();
    let scopes = program.scopes();
    let conn = scopes
        .symbol_at(node_in(&program, "lib/db.js", "conn", 0))
        .unwrap();
    assert_eq!(
        scopes.resolve_import(decl_at(&program, "db", 0)),
        ImportTarget::Decl(conn)
    );
}
