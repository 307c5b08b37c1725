use crate::{
    builtins::{Catalogue, Entry, Kind, Shape},
    session::{AnalysisError, FlowSession},
    test_utils::*,
};

#[test]
fn test_lookups() {
    let catalogue = Catalogue::standard();
    assert!(!catalogue.is_empty());
    assert_eq!(catalogue.len(), Catalogue::default().len());

    let map = catalogue.lookup_method(Kind::Array, "map");
    assert_eq!(map.len(), 1);
    assert_eq!(catalogue.entry(map[0]).shape, Shape::Method(Kind::Array, "map"));
    assert_eq!(catalogue.entry(map[0]).produces, Some(Kind::Array));
    assert!(catalogue.lookup_method(Kind::Set, "map").is_empty());

    let trim = catalogue.lookup_method(Kind::String, "trim");
    assert_eq!(catalogue.entry(trim[0]).produces, Some(Kind::String));
    let includes = catalogue.lookup_method(Kind::String, "includes");
    assert_eq!(catalogue.entry(includes[0]).produces, Some(Kind::Boolean));

    // Namespace members without an entry of their own share the `*` entry.
    let floor = catalogue.lookup_static("Math", "floor");
    assert_eq!(floor, catalogue.lookup_static("Math", "*"));
    assert_eq!(floor.len(), 1);
    assert!(catalogue.lookup_static("JSON", "unknown").is_empty());

    assert_eq!(catalogue.lookup_constructor("Map").len(), 1);
    assert!(catalogue.lookup_global("eval").is_empty());
    assert!(catalogue.entry(catalogue.lookup_method(Kind::Array, "length")[0]).getter);
}

#[test]
fn test_globals_and_namespaces() {
    let catalogue = Catalogue::standard();
    for name in ["parseInt", "Map", "Promise", "JSON", "Math", "Object"] {
        assert!(catalogue.is_global(name), "{name} should be global");
    }
    assert!(!catalogue.is_global("window"));
    assert!(catalogue.is_namespace("JSON"));
    assert!(catalogue.is_namespace("Promise"));
    assert!(!catalogue.is_namespace("Map"));
    assert!(!catalogue.is_namespace("parseInt"));
}

#[test]
fn test_display() {
    assert_eq!(Shape::Static("JSON", "parse").to_string(), "JSON.parse");
    assert_eq!(Shape::Constructor("Map").to_string(), "new Map");
    assert_eq!(Shape::Method(Kind::Array, "map").to_string(), "Array#map");
    assert_eq!(Shape::Global("fetch").to_string(), "fetch");
    assert_eq!(Kind::RegExp.to_string(), "RegExp");
    assert_eq!(Kind::Namespace.to_string(), "Namespace");
}

#[test]
fn test_builtin_results() {
    let source = "\
const n = parseInt('1');
const f = Math.floor(2.5);
const d = new Date();
";
    let program = parse_string(source).unwrap();
    let mut session = session(&program, 1);
    assert_eq!(values_of(&mut session, "parseInt('1')", 0), strings(&["parseInt('1')"]));
    assert_eq!(values_of(&mut session, "Math.floor(2.5)", 0), strings(&["<external>"]));
    assert_eq!(values_of(&mut session, "d", 0), strings(&["new Date()"]));
}

#[test]
fn test_ambiguous_builtins_are_errors() {
    let catalogue = Catalogue::from_entries(vec![
        Entry::new(Shape::Global("twice")),
        Entry::new(Shape::Global("twice")),
    ]);
    assert!(catalogue.is_global("twice"));
    assert_eq!(catalogue.lookup_global("twice").len(), 2);

    let program = parse_string("const r = twice();").unwrap();
    let mut session = FlowSession::with_catalogue(&program, Default::default(), catalogue);
    let config = session.top_level(node(&program, "twice()", 0));
    let error = session.evaluate(config).unwrap_err();
    assert_eq!(
        error,
        AnalysisError::AmbiguousBuiltin {
            line: 1,
            label: "twice".to_owned(),
            candidates: strings(&["twice", "twice"]),
        }
    );
    assert_eq!(
        error.to_string(),
        "[line 1] Ambiguous builtin for 'twice': twice, twice."
    );
}
