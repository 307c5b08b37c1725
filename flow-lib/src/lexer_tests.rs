use super::lexer::*;
use utils::DiagnosticEmitter;

#[derive(Debug)]
struct LexTestResult {
    output: String,
    result: LexResult,
}

fn lex_string(source: &str) -> LexTestResult {
    let mut diag = DiagnosticEmitter::log_to_buffer();
    let lexer = Lexer::new(source, &mut diag);
    let tokens = lexer.lex_all();
    LexTestResult {
        output: diag.out_buffer().unwrap_or_default() + &diag.err_buffer().unwrap_or_default(),
        result: tokens,
    }
}

fn to_token_values(tokens: Vec<Token>) -> Vec<TokenValue> {
    tokens.into_iter().map(|tok| tok.value).collect()
}

use TokenValue::*;

#[test]
fn test_empty_input() {
    let LexTestResult { output, result } = lex_string("");
    assert_eq!(to_token_values(result.tokens), vec![EndOfFile]);
    assert_eq!(output, "");

    let LexTestResult { output, result } = lex_string("  \n\t\r\n// comment\n/* block\n */");
    assert_eq!(to_token_values(result.tokens), vec![EndOfFile]);
    assert_eq!(output, "");
}

#[test]
fn test_declaration() {
    let LexTestResult { output, result } = lex_string("const x = 42;\nlet y = x;");
    let expected = vec![
        Const,
        Identifier(Symbol(0)),
        Assign,
        Number(Symbol(1)),
        Semicolon,
        Let,
        Identifier(Symbol(2)),
        Assign,
        Identifier(Symbol(0)),
        Semicolon,
        EndOfFile,
    ];
    assert_eq!(to_token_values(result.tokens.clone()), expected);
    assert_eq!(output, "");
    assert_eq!(result.identifiers.get_name(Symbol(1)), "42");
    assert_eq!(result.tokens[5].line_num, Location(2));
    assert!(result.tokens[5].newline_before);
    assert!(!result.tokens[6].newline_before);
}

#[test]
fn test_keywords_and_punctuators() {
    let LexTestResult { output, result } =
        lex_string("async function f(...a) { return a?.b ?? c >>>= 1 => !== ** ?.5; }");
    let expected = vec![
        Async,
        Function,
        Identifier(Symbol(0)),
        LeftParen,
        Ellipsis,
        Identifier(Symbol(1)),
        RightParen,
        LeftBrace,
        Return,
        Identifier(Symbol(1)),
        QuestionDot,
        Identifier(Symbol(2)),
        QuestionQuestion,
        Identifier(Symbol(3)),
        ShiftRightUnsignedAssign,
        Number(Symbol(4)),
        Arrow,
        BangEqEq,
        StarStar,
        Question,
        Number(Symbol(5)),
        Semicolon,
        RightBrace,
        EndOfFile,
    ];
    assert_eq!(to_token_values(result.tokens), expected);
    assert_eq!(output, "");
    assert_eq!(result.identifiers.get_name(Symbol(5)), ".5");
}

#[test]
fn test_strings_and_templates() {
    let LexTestResult { output, result } = lex_string(r#"'it\'s' "a\nb" `x${y}z${ {w} }`"#);
    let expected = vec![
        Str(Symbol(0)),
        Str(Symbol(1)),
        TemplateHead(Symbol(2)),
        Identifier(Symbol(3)),
        TemplateMiddle(Symbol(4)),
        LeftBrace,
        Identifier(Symbol(5)),
        RightBrace,
        TemplateTail(Symbol(6)),
        EndOfFile,
    ];
    assert_eq!(to_token_values(result.tokens), expected);
    assert_eq!(output, "");
    assert_eq!(result.identifiers.get_name(Symbol(0)), "it's");
    assert_eq!(result.identifiers.get_name(Symbol(1)), "a\nb");
    assert_eq!(result.identifiers.get_name(Symbol(6)), "");
}

#[test]
fn test_numbers() {
    let LexTestResult { output, result } = lex_string("0xFF 1_000 1.5e-3 10n");
    let names: Vec<_> = result
        .tokens
        .iter()
        .filter_map(|tok| match tok.value {
            Number(sym) => Some(result.identifiers.get_name(sym).to_owned()),
            _ => None,
        })
        .collect();
    assert_eq!(names, vec!["0xFF", "1_000", "1.5e-3", "10n"]);
    assert_eq!(output, "");
}

#[test]
fn test_errors() {
    let LexTestResult { output, result } = lex_string("let s = 'abc");
    assert!(result.tokens.is_empty());
    assert_eq!(output, "[line 1] Error: Unterminated string literal.\n");

    let LexTestResult { output, result } = lex_string("a\n#");
    assert!(result.tokens.is_empty());
    assert_eq!(output, "[line 2] Error: Unexpected token: '#'.\n");

    let LexTestResult { output, .. } = lex_string("/* open");
    assert_eq!(output, "[line 1] Error: Multiline comment not closed.\n");

    let LexTestResult { output, .. } = lex_string("`a${b");
    assert_eq!(output, "[line 1] Error: Unterminated template literal.\n");

    let LexTestResult { output, .. } = lex_string("12abc");
    assert_eq!(output, "[line 1] Error: Invalid number literal.\n");

    let LexTestResult { output, .. } = lex_string("const λ = 1;");
    assert_eq!(output, "[line 1] Error: Only ASCII input is supported.\n");
}

#[test]
fn test_token_display() {
    assert_eq!(Const.to_string(), "const");
    assert_eq!(ShiftRightUnsignedAssign.to_string(), ">>>=");
    assert_eq!(Identifier(Symbol(3)).to_string(), "identifier_3");
    assert_eq!(EndOfFile.to_string(), "END_OF_FILE");
    assert_eq!(Arrow.keyword_text(), None);
    assert_eq!(Instanceof.keyword_text(), Some("instanceof"));
}
