use super::*;

#[test]
fn captures_both_channels() {
    let mut diag = DiagnosticEmitter::log_to_buffer();
    diag.out_ln("result");
    diag.report(3, "'foo'", "Unsupported expression.");
    diag.warn(4, "", "Unused value.");
    diag.error(5, "Unexpected end of file.");

    assert_eq!(diag.out_buffer().unwrap(), "result\n");
    assert_eq!(
        diag.err_buffer().unwrap(),
        "[line 3] Error 'foo': Unsupported expression.\n\
         [line 4] Warning: Unused value.\n\
         [line 5] Error: Unexpected end of file.\n"
    );
    assert_eq!(diag.error_count(), 2);
    assert_eq!(diag.warning_count(), 1);
    assert!(diag.has_errors());
}

#[test]
fn streams_are_not_captured() {
    let diag = DiagnosticEmitter::new(Box::new(std::io::sink()), Box::new(std::io::sink()));
    assert_eq!(diag.out_buffer(), None);
    assert!(!diag.has_errors());
}

#[test]
fn line_index() {
    let index = LineIndex::new("let a = 1;\nlet b = a;\r\n\nλ(b)");
    assert_eq!(index.line_count(), 4);
    assert_eq!(index.location(0), Location { line: 1, column: 1 });
    assert_eq!(index.location(4), Location { line: 1, column: 5 });
    assert_eq!(index.location(11).to_string(), "2:1");
    assert_eq!(index.line_text(2), Some("let b = a;"));
    assert_eq!(index.line_text(3), Some(""));
    // 'λ' takes two bytes but one column.
    let open = "let a = 1;\nlet b = a;\r\n\nλ".len();
    assert_eq!(index.location(open), Location { line: 4, column: 2 });
    assert_eq!(index.line_text(0), None);
    assert_eq!(index.line_text(9), None);
}
