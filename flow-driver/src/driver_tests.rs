use crate::*;

fn run_driver(sources: &[(&str, &str)], opts: Opt) -> Option<String> {
    let mut diag = DiagnosticEmitter::log_to_buffer();
    process_sources(sources, &mut diag, &opts)?;
    Some(diag.out_buffer().unwrap() + &diag.err_buffer().unwrap())
}

fn run_failing(sources: &[(&str, &str)], opts: Opt) -> String {
    let mut diag = DiagnosticEmitter::log_to_buffer();
    assert!(process_sources(sources, &mut diag, &opts).is_none());
    diag.out_buffer().unwrap() + &diag.err_buffer().unwrap()
}

#[test]
fn declarations_are_evaluated() {
    let source = "function f(x) { return x; }\nconst a = f(2);\nconst b = f(3);\n";
    let expected = "2:11 f(2) = {2}\n3:11 f(3) = {3}\n";
    let output = run_driver(&[("main.js", source)], Opt::default()).unwrap();
    assert_eq!(output, expected);

    let expected = "2:11 f(2) = {2, 3}\n3:11 f(3) = {2, 3}\n";
    let opts = Opt {
        m: 0,
        ..Opt::default()
    };
    let output = run_driver(&[("main.js", source)], opts).unwrap();
    assert_eq!(output, expected);
}

#[test]
fn call_arguments() {
    let source = r"const db = connect();
function run(sql) { return db.query(sql, 1); }
run('SELECT 1');
run('SELECT 2');
";
    let opts = Opt::parse_from(["flow", "--call", "query", "--arg", "0", "main.js"]);
    let output = run_driver(&[("main.js", source)], opts).unwrap();
    assert_eq!(output, "2:37 sql = {'SELECT 1', 'SELECT 2'}\n");

    let opts = Opt::parse_from(["flow", "--call", "query", "main.js"]);
    let output = run_driver(&[("main.js", source)], opts).unwrap();
    assert_eq!(
        output,
        "2:37 sql = {'SELECT 1', 'SELECT 2'}\n2:42 1 = {1}\n"
    );
}

#[test]
fn line_filter_and_diagnostics() {
    let source = "const z = 1 | 2;\nconst y = z;\n";
    let opts = Opt {
        line: Some(2),
        ..Opt::default()
    };
    let expected = "2:11 z = {}\n[line 1] Unsupported '1 | 2': Bitwise operators are not modeled.\n";
    let output = run_driver(&[("main.js", source)], opts).unwrap();
    assert_eq!(output, expected);
}

#[test]
fn modules_are_prefixed() {
    let lib = "export function g(a) { return a; }\n";
    let main = "import { g } from './lib.js';\nconst v = g(5);\n";
    let output = run_driver(&[("lib.js", lib), ("main.js", main)], Opt::default()).unwrap();
    assert_eq!(output, "main.js:2:11 g(5) = {5}\n");
}

#[test]
fn entry_points() {
    let source = "function handler(req) { const body = req; }\n";
    let opts = Opt {
        entry: vec!["handler".to_owned()],
        ..Opt::default()
    };
    let output = run_driver(&[("main.js", source)], opts).unwrap();
    assert_eq!(output, "1:38 req = {<external>}\n");

    let opts = Opt {
        entry: vec!["missing".to_owned()],
        ..Opt::default()
    };
    let output = run_failing(&[("main.js", source)], opts);
    assert_eq!(output, "No function named 'missing'.\n");
}

#[test]
fn statistics() {
    let source = "const a = 1;\n";
    let opts = Opt {
        stats: true,
        ..Opt::default()
    };
    let output = run_driver(&[("main.js", source)], opts).unwrap();
    let mut lines = output.lines();
    assert_eq!(lines.next(), Some("1:11 1 = {1}"));
    assert!(lines.next().is_some_and(|line| line.starts_with("evaluations: ")));
}

#[test]
fn parse_errors_stop_the_analysis() {
    let output = run_failing(&[("main.js", "const = 1;")], Opt::default());
    assert_eq!(output, "[line 1] Error at '=': Identifier expected.\n");
}

#[test]
fn command_line() {
    let opts = Opt::parse_from([
        "flow", "--m", "2", "--line", "3", "--entry", "a", "--entry", "b", "--stats", "x.js",
        "y.js",
    ]);
    assert_eq!(opts.m, 2);
    assert_eq!(opts.line, Some(3));
    assert_eq!(opts.entry, vec!["a", "b"]);
    assert!(opts.stats);
    assert_eq!(opts.files, vec!["x.js", "y.js"]);
    assert_eq!(Opt::parse_from(["flow", "x.js"]).m, 1);

    assert!(Opt::try_parse_from(["flow", "--arg", "1", "x.js"]).is_err());
    assert!(Opt::try_parse_from(["flow"]).is_err());
}
