use std::sync::LazyLock;

use rustc_hash::FxHashMap;
use utils::DiagnosticEmitter;

/// Interned string: identifier names, string literal contents and the source
/// text of number literals all live in the [`IdentifierTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(pub u32);

#[derive(Clone, Debug, Copy, Eq, PartialEq, Hash)]
pub struct Location(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenValue {
    Identifier(Symbol),
    Number(Symbol),
    Str(Symbol),
    /// A template literal without substitutions.
    Template(Symbol),
    /// The text up to the first `${` of a template.
    TemplateHead(Symbol),
    /// The text between a `}` and the next `${` of a template.
    TemplateMiddle(Symbol),
    /// The text after the last substitution of a template.
    TemplateTail(Symbol),

    // Keywords
    Const,
    Let,
    Var,
    Function,
    Async,
    Await,
    Return,
    If,
    Else,
    While,
    For,
    In,
    Try,
    Catch,
    Finally,
    Throw,
    Break,
    Continue,
    New,
    Import,
    Export,
    Default,
    True,
    False,
    Null,
    Undefined,
    This,
    Typeof,
    Void,
    Delete,
    Instanceof,

    // Separators
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    LeftBracket,
    RightBracket,
    Semicolon,
    Comma,
    Colon,
    Dot,
    Ellipsis,
    Question,
    QuestionDot,
    Arrow,

    // Operators
    Plus,
    Minus,
    Star,
    StarStar,
    Slash,
    Percent,
    PlusPlus,
    MinusMinus,
    Bang,
    Tilde,
    Amp,
    Pipe,
    Caret,
    ShiftLeft,
    ShiftRight,
    ShiftRightUnsigned,
    AmpAmp,
    PipePipe,
    QuestionQuestion,
    Less,
    Greater,
    LessEq,
    GreaterEq,
    EqEq,
    EqEqEq,
    BangEq,
    BangEqEq,

    // Assignments
    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    StarStarAssign,
    SlashAssign,
    PercentAssign,
    AmpAssign,
    PipeAssign,
    CaretAssign,
    ShiftLeftAssign,
    ShiftRightAssign,
    ShiftRightUnsignedAssign,
    AmpAmpAssign,
    PipePipeAssign,
    QuestionQuestionAssign,

    EndOfFile,
}

use TokenValue::*;

impl TokenValue {
    /// The spelling of keywords, they can still be used as property names.
    pub fn keyword_text(&self) -> Option<&'static str> {
        Some(match self {
            Const => "const",
            Let => "let",
            Var => "var",
            Function => "function",
            Async => "async",
            Await => "await",
            Return => "return",
            If => "if",
            Else => "else",
            While => "while",
            For => "for",
            In => "in",
            Try => "try",
            Catch => "catch",
            Finally => "finally",
            Throw => "throw",
            Break => "break",
            Continue => "continue",
            New => "new",
            Import => "import",
            Export => "export",
            Default => "default",
            True => "true",
            False => "false",
            Null => "null",
            Undefined => "undefined",
            This => "this",
            Typeof => "typeof",
            Void => "void",
            Delete => "delete",
            Instanceof => "instanceof",
            _ => return None,
        })
    }
}

impl core::fmt::Display for TokenValue {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        if let Some(kw) = self.keyword_text() {
            return write!(f, "{kw}");
        }
        let text = match *self {
            Identifier(s) => return write!(f, "identifier_{}", s.0),
            Number(s) => return write!(f, "number_{}", s.0),
            Str(s) => return write!(f, "string_{}", s.0),
            Template(s) | TemplateHead(s) | TemplateMiddle(s) | TemplateTail(s) => {
                return write!(f, "template_{}", s.0);
            }
            LeftParen => "(",
            RightParen => ")",
            LeftBrace => "{",
            RightBrace => "}",
            LeftBracket => "[",
            RightBracket => "]",
            Semicolon => ";",
            Comma => ",",
            Colon => ":",
            Dot => ".",
            Ellipsis => "...",
            Question => "?",
            QuestionDot => "?.",
            Arrow => "=>",
            Plus => "+",
            Minus => "-",
            Star => "*",
            StarStar => "**",
            Slash => "/",
            Percent => "%",
            PlusPlus => "++",
            MinusMinus => "--",
            Bang => "!",
            Tilde => "~",
            Amp => "&",
            Pipe => "|",
            Caret => "^",
            ShiftLeft => "<<",
            ShiftRight => ">>",
            ShiftRightUnsigned => ">>>",
            AmpAmp => "&&",
            PipePipe => "||",
            QuestionQuestion => "??",
            Less => "<",
            Greater => ">",
            LessEq => "<=",
            GreaterEq => ">=",
            EqEq => "==",
            EqEqEq => "===",
            BangEq => "!=",
            BangEqEq => "!==",
            Assign => "=",
            PlusAssign => "+=",
            MinusAssign => "-=",
            StarAssign => "*=",
            StarStarAssign => "**=",
            SlashAssign => "/=",
            PercentAssign => "%=",
            AmpAssign => "&=",
            PipeAssign => "|=",
            CaretAssign => "^=",
            ShiftLeftAssign => "<<=",
            ShiftRightAssign => ">>=",
            ShiftRightUnsignedAssign => ">>>=",
            AmpAmpAssign => "&&=",
            PipePipeAssign => "||=",
            QuestionQuestionAssign => "??=",
            EndOfFile => "END_OF_FILE",
            _ => unreachable!("Keywords are printed above."),
        };
        write!(f, "{text}")
    }
}

static KEYWORDS: LazyLock<FxHashMap<&'static str, TokenValue>> = LazyLock::new(|| {
    let mut m = FxHashMap::default();
    for kw in [
        Const, Let, Var, Function, Async, Await, Return, If, Else, While, For, In, Try, Catch,
        Finally, Throw, Break, Continue, New, Import, Export, Default, True, False, Null,
        Undefined, This, Typeof, Void, Delete, Instanceof,
    ] {
        if let Some(text) = kw.keyword_text() {
            m.insert(text, kw);
        }
    }
    m
});

/// Punctuators ordered so that the longest spelling is tried first.
const PUNCTUATORS: &[(&str, TokenValue)] = &[
    (">>>=", ShiftRightUnsignedAssign),
    ("...", Ellipsis),
    ("===", EqEqEq),
    ("!==", BangEqEq),
    ("**=", StarStarAssign),
    ("<<=", ShiftLeftAssign),
    (">>=", ShiftRightAssign),
    (">>>", ShiftRightUnsigned),
    ("&&=", AmpAmpAssign),
    ("||=", PipePipeAssign),
    ("??=", QuestionQuestionAssign),
    ("=>", Arrow),
    ("==", EqEq),
    ("!=", BangEq),
    ("<=", LessEq),
    (">=", GreaterEq),
    ("&&", AmpAmp),
    ("||", PipePipe),
    ("??", QuestionQuestion),
    ("?.", QuestionDot),
    ("**", StarStar),
    ("++", PlusPlus),
    ("--", MinusMinus),
    ("<<", ShiftLeft),
    (">>", ShiftRight),
    ("+=", PlusAssign),
    ("-=", MinusAssign),
    ("*=", StarAssign),
    ("/=", SlashAssign),
    ("%=", PercentAssign),
    ("&=", AmpAssign),
    ("|=", PipeAssign),
    ("^=", CaretAssign),
    ("(", LeftParen),
    (")", RightParen),
    ("{", LeftBrace),
    ("}", RightBrace),
    ("[", LeftBracket),
    ("]", RightBracket),
    (";", Semicolon),
    (",", Comma),
    (":", Colon),
    (".", Dot),
    ("?", Question),
    ("+", Plus),
    ("-", Minus),
    ("*", Star),
    ("/", Slash),
    ("%", Percent),
    ("!", Bang),
    ("~", Tilde),
    ("&", Amp),
    ("|", Pipe),
    ("^", Caret),
    ("<", Less),
    (">", Greater),
    ("=", Assign),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub value: TokenValue,
    pub line_num: Location,
    /// Byte offsets of the token in the module source.
    pub start: u32,
    pub end: u32,
    /// Whether a line break separates this token from the previous one.
    pub newline_before: bool,
}

impl Token {
    pub fn error(&self, diag: &mut DiagnosticEmitter, s: &str) {
        if self.value == EndOfFile {
            diag.report(self.line_num.0, "at end of file", s);
        } else {
            diag.report(self.line_num.0, &format!("at '{self}'"), s);
        }
    }
}

impl core::fmt::Display for Token {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "{}", self.value)
    }
}

#[derive(Debug, Clone, Default)]
pub struct IdentifierTable {
    names: Vec<String>,
    lookup: FxHashMap<String, Symbol>,
}

impl IdentifierTable {
    pub fn lookup(&self, ident: &str) -> Option<Symbol> {
        self.lookup.get(ident).copied()
    }

    pub fn intern(&mut self, ident: &str) -> Symbol {
        if let Some(id) = self.lookup(ident) {
            return id;
        }
        let id = Symbol(self.names.len() as u32);
        self.names.push(ident.to_owned());
        self.lookup.insert(ident.to_owned(), id);
        id
    }

    pub fn get_name(&self, id: Symbol) -> &str {
        &self.names[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

pub struct Lexer<'src> {
    source: &'src str,
    start: usize,
    current: usize,
    line_num: u32,
    newline_before: bool,
    has_error: bool,
    /// One entry for each template substitution being lexed, counting the
    /// braces opened inside it.
    templates: Vec<u32>,
    diagnostic_emitter: &'src mut DiagnosticEmitter,
    identifiers: IdentifierTable,
}

#[derive(Debug, Clone, Default)]
pub struct LexResult {
    pub tokens: Vec<Token>,
    pub identifiers: IdentifierTable,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str, diagnostic_emitter: &'src mut DiagnosticEmitter) -> Self {
        Self::with_identifiers(source, IdentifierTable::default(), diagnostic_emitter)
    }

    /// Lexes into an existing table, so several modules can share symbols.
    pub fn with_identifiers(
        source: &'src str,
        identifiers: IdentifierTable,
        diagnostic_emitter: &'src mut DiagnosticEmitter,
    ) -> Self {
        Lexer {
            source,
            start: 0,
            current: 0,
            line_num: 1,
            newline_before: false,
            has_error: false,
            templates: Vec::new(),
            diagnostic_emitter,
            identifiers,
        }
    }

    pub fn lex_all(mut self) -> LexResult {
        if !self.source.is_ascii() {
            self.diagnostic_emitter
                .error(self.line_num, "Only ASCII input is supported.");
            return LexResult {
                tokens: Vec::new(),
                identifiers: self.identifiers,
            };
        }

        let mut tokens = Vec::new();
        while !self.is_at_end() {
            if let Some(tok) = self.lex() {
                tokens.push(tok);
            } else if self.has_error {
                return LexResult {
                    tokens: Vec::new(),
                    identifiers: self.identifiers,
                };
            }
        }

        if !self.templates.is_empty() {
            self.diagnostic_emitter
                .error(self.line_num, "Unterminated template literal.");
            return LexResult {
                tokens: Vec::new(),
                identifiers: self.identifiers,
            };
        }

        tokens.push(Token {
            value: EndOfFile,
            line_num: Location(self.line_num),
            start: self.source.len() as u32,
            end: self.source.len() as u32,
            newline_before: true,
        });

        LexResult {
            tokens,
            identifiers: self.identifiers,
        }
    }

    fn make_token(&mut self, value: TokenValue, line: u32) -> Token {
        let newline_before = core::mem::take(&mut self.newline_before);
        Token {
            value,
            line_num: Location(line),
            start: self.start as u32,
            end: self.current as u32,
            newline_before,
        }
    }

    fn fail(&mut self, line: u32, msg: &str) -> Option<Token> {
        self.diagnostic_emitter.error(line, msg);
        self.has_error = true;
        None
    }

    fn lex(&mut self) -> Option<Token> {
        loop {
            if self.is_at_end() {
                return None;
            }

            self.start = self.current;
            let line = self.line_num;
            match self.advance() {
                // Whitespace
                '\n' => {
                    self.line_num += 1;
                    self.newline_before = true;
                    continue;
                }
                ' ' | '\t' | '\r' => continue,

                // Comments
                '/' if self.peek() == '/' => {
                    while self.peek() != '\n' && !self.is_at_end() {
                        self.advance();
                    }
                    continue;
                }
                '/' if self.peek() == '*' => {
                    self.advance();
                    loop {
                        if self.is_at_end() {
                            return self.fail(line, "Multiline comment not closed.");
                        }
                        match self.advance() {
                            '\n' => {
                                self.line_num += 1;
                                self.newline_before = true;
                            }
                            '*' if self.match_char('/') => break,
                            _ => {}
                        }
                    }
                    continue;
                }

                c @ ('"' | '\'') => return self.lex_string(c, line),
                '`' => return self.lex_template(line, true),

                '{' => {
                    if let Some(depth) = self.templates.last_mut() {
                        *depth += 1;
                    }
                    return Some(self.make_token(LeftBrace, line));
                }
                '}' => {
                    match self.templates.last_mut() {
                        Some(0) => {
                            self.templates.pop();
                            return self.lex_template(line, false);
                        }
                        Some(depth) => *depth -= 1,
                        None => {}
                    }
                    return Some(self.make_token(RightBrace, line));
                }

                c if c.is_ascii_digit() => return self.lex_number(line),
                '.' if self.peek().is_ascii_digit() => return self.lex_number(line),
                c if c.is_ascii_alphabetic() || c == '_' || c == '$' => {
                    let ident = self.lex_identifier();
                    let value = match KEYWORDS.get(ident) {
                        Some(kw) => *kw,
                        None => Identifier(self.identifiers.intern(ident)),
                    };
                    return Some(self.make_token(value, line));
                }
                _ => {
                    self.current = self.start;
                    let rest = &self.source[self.start..];
                    if let Some(&(text, value)) =
                        PUNCTUATORS.iter().find(|(text, _)| rest.starts_with(text))
                    {
                        // `?.5` is a conditional followed by a number.
                        let optional_number = value == QuestionDot
                            && rest.as_bytes().get(2).is_some_and(u8::is_ascii_digit);
                        let len = if optional_number { 1 } else { text.len() };
                        let value = if optional_number { Question } else { value };
                        self.current += len;
                        return Some(self.make_token(value, line));
                    }
                    self.advance();
                    let msg = format!(
                        "Unexpected token: '{}'.",
                        &self.source[self.start..self.current]
                    );
                    return self.fail(line, &msg);
                }
            }
        }
    }

    fn lex_number(&mut self, line: u32) -> Option<Token> {
        let prefixed = self.source.as_bytes()[self.start] == b'0'
            && matches!(self.peek(), 'x' | 'X' | 'b' | 'B' | 'o' | 'O');
        if prefixed {
            self.advance();
            while self.peek().is_ascii_hexdigit() || self.peek() == '_' {
                self.advance();
            }
        } else {
            while self.peek().is_ascii_digit() || self.peek() == '_' || self.peek() == '.' {
                self.advance();
            }
            if matches!(self.peek(), 'e' | 'E') {
                self.advance();
                if matches!(self.peek(), '+' | '-') {
                    self.advance();
                }
                while self.peek().is_ascii_digit() {
                    self.advance();
                }
            }
        }
        if self.peek() == 'n' {
            self.advance();
        }
        if self.peek().is_ascii_alphabetic() {
            return self.fail(line, "Invalid number literal.");
        }
        let text = &self.source[self.start..self.current];
        let value = Number(self.identifiers.intern(text));
        Some(self.make_token(value, line))
    }

    fn lex_identifier(&mut self) -> &'src str {
        while self.peek().is_ascii_alphanumeric() || self.peek() == '_' || self.peek() == '$' {
            self.advance();
        }

        &self.source[self.start..self.current]
    }

    fn lex_escape(&mut self, out: &mut String) {
        match self.advance() {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            '0' => out.push('\0'),
            '\n' => self.line_num += 1,
            c => out.push(c),
        }
    }

    fn lex_string(&mut self, quote: char, line: u32) -> Option<Token> {
        let mut content = String::new();
        loop {
            if self.is_at_end() || self.peek() == '\n' {
                return self.fail(line, "Unterminated string literal.");
            }
            match self.advance() {
                '\\' => self.lex_escape(&mut content),
                c if c == quote => break,
                c => content.push(c),
            }
        }
        let value = Str(self.identifiers.intern(&content));
        Some(self.make_token(value, line))
    }

    /// Lexes template text until the closing backtick or the next `${`.
    fn lex_template(&mut self, line: u32, opening: bool) -> Option<Token> {
        let mut content = String::new();
        loop {
            if self.is_at_end() {
                return self.fail(line, "Unterminated template literal.");
            }
            match self.advance() {
                '\\' => self.lex_escape(&mut content),
                '`' => {
                    let sym = self.identifiers.intern(&content);
                    let value = if opening { Template(sym) } else { TemplateTail(sym) };
                    return Some(self.make_token(value, line));
                }
                '$' if self.match_char('{') => {
                    self.templates.push(0);
                    let sym = self.identifiers.intern(&content);
                    let value = if opening {
                        TemplateHead(sym)
                    } else {
                        TemplateMiddle(sym)
                    };
                    return Some(self.make_token(value, line));
                }
                '\n' => {
                    self.line_num += 1;
                    content.push('\n');
                }
                c => content.push(c),
            }
        }
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }

    fn peek(&self) -> char {
        self.source
            .as_bytes()
            .get(self.current)
            .map_or('\0', |&b| b as char)
    }

    fn advance(&mut self) -> char {
        let prev = self.peek();
        self.current += 1;
        prev
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.peek() == expected && !self.is_at_end() {
            self.current += 1;
            true
        } else {
            false
        }
    }
}
