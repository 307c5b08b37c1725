use utils::DiagnosticEmitter;

use crate::{
    ast::*,
    lexer::{LexResult, Symbol, Token, TokenValue},
};

pub struct Parser<'src> {
    current_tok: usize,
    tokens: Vec<Token>,
    module: ModuleId,
    /// Set while parsing the head of a `for` statement, where `in` starts
    /// the iterated expression instead of being a binary operator.
    no_in: bool,
    ast: &'src mut Ast,
    diag: &'src mut DiagnosticEmitter,
}

use TokenValue::*;

fn binary_op(tok: TokenValue) -> Option<(u8, BinaryOp)> {
    let result = match tok {
        Pipe => (3, BinaryOp::BitOr),
        Caret => (4, BinaryOp::BitXor),
        Amp => (5, BinaryOp::BitAnd),
        EqEq => (6, BinaryOp::Eq),
        BangEq => (6, BinaryOp::NotEq),
        EqEqEq => (6, BinaryOp::StrictEq),
        BangEqEq => (6, BinaryOp::StrictNotEq),
        Less => (7, BinaryOp::Less),
        Greater => (7, BinaryOp::Greater),
        LessEq => (7, BinaryOp::LessEq),
        GreaterEq => (7, BinaryOp::GreaterEq),
        Instanceof => (7, BinaryOp::Instanceof),
        In => (7, BinaryOp::In),
        ShiftLeft => (8, BinaryOp::ShiftLeft),
        ShiftRight => (8, BinaryOp::ShiftRight),
        ShiftRightUnsigned => (8, BinaryOp::ShiftRightUnsigned),
        Plus => (9, BinaryOp::Add),
        Minus => (9, BinaryOp::Sub),
        Star => (10, BinaryOp::Mul),
        Slash => (10, BinaryOp::Div),
        Percent => (10, BinaryOp::Mod),
        StarStar => (11, BinaryOp::Exp),
        _ => return None,
    };
    Some(result)
}

fn logical_op(tok: TokenValue) -> Option<(u8, LogicalOp)> {
    match tok {
        QuestionQuestion | PipePipe => Some((
            1,
            if tok == PipePipe {
                LogicalOp::Or
            } else {
                LogicalOp::Nullish
            },
        )),
        AmpAmp => Some((2, LogicalOp::And)),
        _ => None,
    }
}

fn assign_op(tok: TokenValue) -> Option<AssignOp> {
    let op = match tok {
        Assign => AssignOp::Assign,
        PlusAssign => AssignOp::Arithmetic(BinaryOp::Add),
        MinusAssign => AssignOp::Arithmetic(BinaryOp::Sub),
        StarAssign => AssignOp::Arithmetic(BinaryOp::Mul),
        StarStarAssign => AssignOp::Arithmetic(BinaryOp::Exp),
        SlashAssign => AssignOp::Arithmetic(BinaryOp::Div),
        PercentAssign => AssignOp::Arithmetic(BinaryOp::Mod),
        AmpAssign => AssignOp::Arithmetic(BinaryOp::BitAnd),
        PipeAssign => AssignOp::Arithmetic(BinaryOp::BitOr),
        CaretAssign => AssignOp::Arithmetic(BinaryOp::BitXor),
        ShiftLeftAssign => AssignOp::Arithmetic(BinaryOp::ShiftLeft),
        ShiftRightAssign => AssignOp::Arithmetic(BinaryOp::ShiftRight),
        ShiftRightUnsignedAssign => AssignOp::Arithmetic(BinaryOp::ShiftRightUnsigned),
        AmpAmpAssign => AssignOp::Logical(LogicalOp::And),
        PipePipeAssign => AssignOp::Logical(LogicalOp::Or),
        QuestionQuestionAssign => AssignOp::Logical(LogicalOp::Nullish),
        _ => return None,
    };
    Some(op)
}

impl<'src> Parser<'src> {
    /// The identifiers of `lexed` become the identifiers of `ast`.
    pub fn new(lexed: LexResult, ast: &'src mut Ast, diag: &'src mut DiagnosticEmitter) -> Self {
        let LexResult {
            tokens,
            identifiers,
        } = lexed;
        ast.identifiers = identifiers;
        let module = ast.next_module_id();

        Parser {
            current_tok: 0,
            tokens,
            module,
            no_in: false,
            ast,
            diag,
        }
    }

    pub fn parse_module(mut self, path: &str, source: &str) -> Option<ModuleId> {
        if self.tokens.is_empty() {
            return None;
        }
        let start = self.peek();
        let mut body = Vec::new();
        while !self.is_at_end() {
            body.push(self.parse_statement()?);
        }
        let root = self.ast.add_node(
            NodeKind::Module { body },
            self.module,
            start.line_num.0,
            (0, source.len() as u32),
        );
        Some(self.ast.add_module(path, source, root))
    }

    //////////////////
    //  Statements  //
    //////////////////

    fn parse_statement(&mut self) -> Option<NodeId> {
        let start = self.peek();
        match start.value {
            Const | Let | Var => {
                let decl = self.parse_var_decl()?;
                self.consume_semicolon()?;
                Some(decl)
            }
            Function => self.parse_function(false, true),
            Async if self.peek_next().value == Function => {
                self.advance();
                self.parse_function(true, true)
            }
            Return => {
                self.advance();
                let value = if self.at_statement_end() {
                    None
                } else {
                    Some(self.parse_expression()?)
                };
                self.consume_semicolon()?;
                Some(self.make(NodeKind::Return { value }, start))
            }
            If => {
                self.advance();
                self.consume(LeftParen, "")?;
                let test = self.parse_expression()?;
                self.consume(RightParen, "")?;
                let then = self.parse_statement()?;
                let els = if self.try_consume(Else).is_some() {
                    Some(self.parse_statement()?)
                } else {
                    None
                };
                Some(self.make(NodeKind::If { test, then, els }, start))
            }
            While => {
                self.advance();
                self.consume(LeftParen, "")?;
                let test = self.parse_expression()?;
                self.consume(RightParen, "")?;
                let body = self.parse_statement()?;
                Some(self.make(NodeKind::While { test, body }, start))
            }
            For => self.parse_for(),
            Try => self.parse_try(),
            Throw => {
                self.advance();
                let value = self.parse_expression()?;
                self.consume_semicolon()?;
                Some(self.make(NodeKind::Throw { value }, start))
            }
            Break | Continue => {
                self.advance();
                if !self.at_statement_end() {
                    // Labels are accepted but ignored.
                    self.consume_identifier()?;
                }
                self.consume_semicolon()?;
                let kind = if start.value == Break {
                    NodeKind::Break
                } else {
                    NodeKind::Continue
                };
                Some(self.make(kind, start))
            }
            LeftBrace => self.parse_block(),
            Semicolon => {
                self.advance();
                Some(self.make(NodeKind::Empty, start))
            }
            Import if self.peek_next().value != LeftParen => self.parse_import(),
            Export => self.parse_export(),
            _ => {
                let expr = self.parse_expression()?;
                self.consume_semicolon()?;
                Some(self.make(NodeKind::ExprStmt { expr }, start))
            }
        }
    }

    fn parse_block(&mut self) -> Option<NodeId> {
        let start = self.consume(LeftBrace, "")?;
        let mut body = Vec::new();
        while !self.check(RightBrace) && !self.is_at_end() {
            body.push(self.parse_statement()?);
        }
        self.consume(RightBrace, "")?;
        Some(self.make(NodeKind::Block { body }, start))
    }

    fn decl_kind(tok: TokenValue) -> DeclKind {
        match tok {
            Const => DeclKind::Const,
            Let => DeclKind::Let,
            _ => DeclKind::Var,
        }
    }

    fn parse_var_decl(&mut self) -> Option<NodeId> {
        let start = self.advance();
        let kind = Self::decl_kind(start.value);
        let mut declarators = Vec::new();
        loop {
            declarators.push(self.parse_declarator()?);
            if self.try_consume(Comma).is_none() {
                break;
            }
        }
        Some(self.make(NodeKind::VarDecl { kind, declarators }, start))
    }

    fn parse_declarator(&mut self) -> Option<NodeId> {
        let start = self.peek();
        let target = self.parse_binding_target()?;
        let init = if self.try_consume(Assign).is_some() {
            Some(self.parse_assignment()?)
        } else {
            None
        };
        Some(self.make(NodeKind::Declarator { target, init }, start))
    }

    fn parse_for(&mut self) -> Option<NodeId> {
        let start = self.consume(For, "")?;
        self.consume(LeftParen, "")?;

        let mut init = None;
        if matches!(self.peek().value, Const | Let | Var) {
            let decl_start = self.advance();
            let kind = Self::decl_kind(decl_start.value);
            let target_start = self.peek();
            let target = self.parse_binding_target()?;
            if self.check_word("of") || self.check(In) {
                let declarator =
                    self.make(NodeKind::Declarator { target, init: None }, target_start);
                let head = self.make(
                    NodeKind::VarDecl {
                        kind,
                        declarators: vec![declarator],
                    },
                    decl_start,
                );
                return self.parse_for_of(start, head);
            }
            let first_init = if self.try_consume(Assign).is_some() {
                self.no_in = true;
                let value = self.parse_assignment();
                self.no_in = false;
                Some(value?)
            } else {
                None
            };
            let mut declarators = vec![self.make(
                NodeKind::Declarator {
                    target,
                    init: first_init,
                },
                target_start,
            )];
            while self.try_consume(Comma).is_some() {
                declarators.push(self.parse_declarator()?);
            }
            init = Some(self.make(NodeKind::VarDecl { kind, declarators }, decl_start));
        } else if !self.check(Semicolon) {
            self.no_in = true;
            let expr = self.parse_expression();
            self.no_in = false;
            let expr = expr?;
            if self.check_word("of") || self.check(In) {
                self.to_pattern(expr)?;
                return self.parse_for_of(start, expr);
            }
            init = Some(expr);
        }

        self.consume(Semicolon, "")?;
        let test = if self.check(Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.consume(Semicolon, "")?;
        let update = if self.check(RightParen) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.consume(RightParen, "")?;
        let body = self.parse_statement()?;
        Some(self.make(
            NodeKind::For {
                init,
                test,
                update,
                body,
            },
            start,
        ))
    }

    fn parse_for_of(&mut self, start: Token, head: NodeId) -> Option<NodeId> {
        let is_in = self.advance().value == In;
        let iterated = self.parse_assignment()?;
        self.consume(RightParen, "")?;
        let body = self.parse_statement()?;
        Some(self.make(
            NodeKind::ForOf {
                is_in,
                head,
                iterated,
                body,
            },
            start,
        ))
    }

    fn parse_try(&mut self) -> Option<NodeId> {
        let start = self.consume(Try, "")?;
        let block = self.parse_block()?;
        let mut handler = None;
        if let Some(catch) = self.try_consume(Catch) {
            let param = if self.try_consume(LeftParen).is_some() {
                let param = self.parse_binding_target()?;
                self.consume(RightParen, "")?;
                Some(param)
            } else {
                None
            };
            let body = self.parse_block()?;
            handler = Some(self.make(NodeKind::Catch { param, body }, catch));
        }
        let finalizer = if self.try_consume(Finally).is_some() {
            Some(self.parse_block()?)
        } else {
            None
        };
        if handler.is_none() && finalizer.is_none() {
            self.error(self.peek(), "Expect 'catch' or 'finally' after try block.");
            return None;
        }
        Some(self.make(
            NodeKind::Try {
                block,
                handler,
                finalizer,
            },
            start,
        ))
    }

    fn parse_module_source(&mut self) -> Option<Symbol> {
        if !self.check_word("from") {
            self.error(self.peek(), "'from' expected.");
            return None;
        }
        self.advance();
        self.consume_string()
    }

    fn parse_import(&mut self) -> Option<NodeId> {
        let start = self.consume(Import, "")?;
        let mut specifiers = Vec::new();

        if let Str(source) = self.peek().value {
            self.advance();
            self.consume_semicolon()?;
            return Some(self.make(NodeKind::Import { specifiers, source }, start));
        }

        if let Identifier(_) = self.peek().value {
            let spec_start = self.peek();
            let local = self.parse_binding()?;
            specifiers.push(self.make(
                NodeKind::ImportSpecifier {
                    kind: ImportKind::Default,
                    local,
                },
                spec_start,
            ));
            if self.try_consume(Comma).is_none() {
                let source = self.parse_module_source()?;
                self.consume_semicolon()?;
                return Some(self.make(NodeKind::Import { specifiers, source }, start));
            }
        }

        if let Some(star) = self.try_consume(Star) {
            if !self.check_word("as") {
                self.error(self.peek(), "'as' expected.");
                return None;
            }
            self.advance();
            let local = self.parse_binding()?;
            specifiers.push(self.make(
                NodeKind::ImportSpecifier {
                    kind: ImportKind::Namespace,
                    local,
                },
                star,
            ));
        } else {
            self.consume(LeftBrace, "")?;
            while !self.check(RightBrace) {
                let spec_start = self.peek();
                let imported = self.consume_property_name()?;
                let local = if self.check_word("as") {
                    self.advance();
                    self.parse_binding()?
                } else {
                    self.make(NodeKind::Binding { name: imported }, spec_start)
                };
                let kind = if self.ast.name(imported) == "default" {
                    ImportKind::Default
                } else {
                    ImportKind::Named(imported)
                };
                specifiers.push(self.make(NodeKind::ImportSpecifier { kind, local }, spec_start));
                if self.try_consume(Comma).is_none() {
                    break;
                }
            }
            self.consume(RightBrace, "")?;
        }

        let source = self.parse_module_source()?;
        self.consume_semicolon()?;
        Some(self.make(NodeKind::Import { specifiers, source }, start))
    }

    fn parse_export(&mut self) -> Option<NodeId> {
        let start = self.consume(Export, "")?;
        match self.peek().value {
            Default => {
                self.advance();
                let value = match self.peek().value {
                    Function => self.parse_function(false, true)?,
                    Async if self.peek_next().value == Function => {
                        self.advance();
                        self.parse_function(true, true)?
                    }
                    _ => {
                        let value = self.parse_assignment()?;
                        self.consume_semicolon()?;
                        value
                    }
                };
                Some(self.make(NodeKind::ExportDefault { value }, start))
            }
            Const | Let | Var | Function | Async => {
                let decl = self.parse_statement()?;
                Some(self.make(NodeKind::Export { decl }, start))
            }
            LeftBrace => {
                self.advance();
                let mut specifiers = Vec::new();
                while !self.check(RightBrace) {
                    let spec_start = self.peek();
                    let name = self.consume_property_name()?;
                    let local = self.make(NodeKind::Identifier { name }, spec_start);
                    let exported = if self.check_word("as") {
                        self.advance();
                        self.consume_property_name()?
                    } else {
                        name
                    };
                    specifiers
                        .push(self.make(NodeKind::ExportSpecifier { local, exported }, spec_start));
                    if self.try_consume(Comma).is_none() {
                        break;
                    }
                }
                self.consume(RightBrace, "")?;
                let source = if self.check_word("from") {
                    Some(self.parse_module_source()?)
                } else {
                    None
                };
                self.consume_semicolon()?;
                Some(self.make(NodeKind::ExportNamed { specifiers, source }, start))
            }
            _ => {
                self.error(self.peek(), "Declaration or '{' expected after export.");
                None
            }
        }
    }

    /////////////////
    //  Functions  //
    /////////////////

    /// Parses `function name(params) { body }`, the `async` keyword is
    /// already consumed.
    fn parse_function(&mut self, is_async: bool, is_declaration: bool) -> Option<NodeId> {
        let start = if is_async {
            self.previous()
        } else {
            self.peek()
        };
        self.consume(Function, "")?;
        // Generators are parsed as plain functions.
        self.try_consume(Star);
        let name = if let Identifier(_) = self.peek().value {
            Some(self.parse_binding()?)
        } else {
            None
        };
        if is_declaration && name.is_none() && !self.is_export_default() {
            self.error(self.peek(), "Function name expected.");
            return None;
        }
        let params = self.parse_params()?;
        let body = self.parse_block()?;
        let flags = FunctionFlags {
            is_async,
            is_declaration: is_declaration && name.is_some(),
            ..FunctionFlags::default()
        };
        Some(self.make(
            NodeKind::Function {
                name,
                params,
                body,
                flags,
            },
            start,
        ))
    }

    fn is_export_default(&self) -> bool {
        self.tokens[..self.current_tok]
            .iter()
            .rev()
            .find(|tok| !matches!(tok.value, Function | Async))
            .is_some_and(|tok| tok.value == Default)
    }

    fn parse_params(&mut self) -> Option<Vec<NodeId>> {
        self.consume(LeftParen, "")?;
        let mut params = Vec::new();
        while !self.check(RightParen) {
            if let Some(dots) = self.try_consume(Ellipsis) {
                let argument = self.parse_binding_target()?;
                params.push(self.make(NodeKind::Rest { argument }, dots));
                break;
            }
            params.push(self.parse_binding_element()?);
            if self.try_consume(Comma).is_none() {
                break;
            }
        }
        self.consume(RightParen, "")?;
        Some(params)
    }

    /// Whether the tokens at `pos` start the parameters of an arrow function.
    fn is_arrow_ahead(&self, pos: usize) -> bool {
        let Some(tok) = self.tokens.get(pos) else {
            return false;
        };
        match tok.value {
            Identifier(_) => self
                .tokens
                .get(pos + 1)
                .is_some_and(|next| next.value == Arrow),
            LeftParen => {
                let mut depth = 0usize;
                for (idx, tok) in self.tokens.iter().enumerate().skip(pos) {
                    match tok.value {
                        LeftParen | LeftBracket | LeftBrace => depth += 1,
                        RightParen | RightBracket | RightBrace => {
                            depth -= 1;
                            if depth == 0 {
                                return self
                                    .tokens
                                    .get(idx + 1)
                                    .is_some_and(|next| next.value == Arrow);
                            }
                        }
                        EndOfFile => return false,
                        _ => {}
                    }
                }
                false
            }
            _ => false,
        }
    }

    fn parse_arrow(&mut self, is_async: bool) -> Option<NodeId> {
        let start = self.peek();
        if is_async {
            self.advance();
        }
        let params = if let Identifier(_) = self.peek().value {
            vec![self.parse_binding()?]
        } else {
            self.parse_params()?
        };
        self.consume(Arrow, "")?;
        let (body, expression_body) = if self.check(LeftBrace) {
            (self.parse_block()?, false)
        } else {
            (self.parse_assignment()?, true)
        };
        let flags = FunctionFlags {
            is_arrow: true,
            is_async,
            is_declaration: false,
            expression_body,
        };
        Some(self.make(
            NodeKind::Function {
                name: None,
                params,
                body,
                flags,
            },
            start,
        ))
    }

    ////////////////
    //  Patterns  //
    ////////////////

    fn parse_binding(&mut self) -> Option<NodeId> {
        let tok = self.peek();
        let name = self.consume_identifier()?;
        Some(self.make(NodeKind::Binding { name }, tok))
    }

    fn parse_binding_target(&mut self) -> Option<NodeId> {
        let start = self.peek();
        match start.value {
            LeftBracket => {
                self.advance();
                let mut elements = Vec::new();
                while !self.check(RightBracket) {
                    if self.try_consume(Comma).is_some() {
                        elements.push(None);
                        continue;
                    }
                    if let Some(dots) = self.try_consume(Ellipsis) {
                        let argument = self.parse_binding_target()?;
                        elements.push(Some(self.make(NodeKind::Rest { argument }, dots)));
                        break;
                    }
                    elements.push(Some(self.parse_binding_element()?));
                    if self.try_consume(Comma).is_none() {
                        break;
                    }
                }
                self.consume(RightBracket, "")?;
                Some(self.make(NodeKind::ArrayPattern { elements }, start))
            }
            LeftBrace => {
                self.advance();
                let mut properties = Vec::new();
                while !self.check(RightBrace) {
                    let prop_start = self.peek();
                    if self.try_consume(Ellipsis).is_some() {
                        let argument = self.parse_binding()?;
                        properties.push(self.make(NodeKind::Rest { argument }, prop_start));
                        break;
                    }
                    let (key, name_tok) = self.parse_property_key()?;
                    let property = if self.try_consume(Colon).is_some() {
                        let value = self.parse_binding_element()?;
                        NodeKind::Property {
                            key,
                            value,
                            shorthand: false,
                        }
                    } else {
                        let (PropKey::Named(name), Some(name_tok)) = (key, name_tok) else {
                            self.error(self.peek(), "':' expected.");
                            return None;
                        };
                        let mut value = self.make(NodeKind::Binding { name }, name_tok);
                        if self.try_consume(Assign).is_some() {
                            let default = self.parse_assignment()?;
                            value = self.make(
                                NodeKind::AssignPattern {
                                    target: value,
                                    default,
                                },
                                name_tok,
                            );
                        }
                        NodeKind::Property {
                            key,
                            value,
                            shorthand: true,
                        }
                    };
                    properties.push(self.make(property, prop_start));
                    if self.try_consume(Comma).is_none() {
                        break;
                    }
                }
                self.consume(RightBrace, "")?;
                Some(self.make(NodeKind::ObjectPattern { properties }, start))
            }
            _ => self.parse_binding(),
        }
    }

    /// A binding target with an optional default value.
    fn parse_binding_element(&mut self) -> Option<NodeId> {
        let start = self.peek();
        let target = self.parse_binding_target()?;
        if self.try_consume(Assign).is_some() {
            let default = self.parse_assignment()?;
            return Some(self.make(NodeKind::AssignPattern { target, default }, start));
        }
        Some(target)
    }

    /// Reinterprets an expression on the left of `=` as a destructuring
    /// pattern. Names stay references, they refer to existing variables.
    fn to_pattern(&mut self, node: NodeId) -> Option<()> {
        let kind = self.ast.kind(node).clone();
        match kind {
            NodeKind::Identifier { .. } | NodeKind::Member { .. } | NodeKind::Index { .. } => {
                Some(())
            }
            NodeKind::Array { elements } => {
                for element in elements.iter().flatten() {
                    self.to_pattern(*element)?;
                }
                self.ast.set_kind(node, NodeKind::ArrayPattern { elements });
                Some(())
            }
            NodeKind::Object { properties } => {
                for property in &properties {
                    self.to_pattern(*property)?;
                }
                self.ast.set_kind(node, NodeKind::ObjectPattern { properties });
                Some(())
            }
            NodeKind::Property { value, .. } => self.to_pattern(value),
            NodeKind::Spread { argument } => {
                self.to_pattern(argument)?;
                self.ast.set_kind(node, NodeKind::Rest { argument });
                Some(())
            }
            NodeKind::Assign {
                op: AssignOp::Assign,
                target,
                value,
            } => {
                self.ast.set_kind(
                    node,
                    NodeKind::AssignPattern {
                        target,
                        default: value,
                    },
                );
                Some(())
            }
            _ => {
                let line = self.ast.line(node);
                self.diag.error(line, "Invalid assignment target.");
                None
            }
        }
    }

    ///////////////////
    //  Expressions  //
    ///////////////////

    fn parse_expression(&mut self) -> Option<NodeId> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> Option<NodeId> {
        let start = self.peek();
        if self.is_arrow_ahead(self.current_tok) {
            return self.parse_arrow(false);
        }
        if start.value == Async && self.is_arrow_ahead(self.current_tok + 1) {
            return self.parse_arrow(true);
        }

        let target = self.parse_conditional()?;
        let Some(op) = assign_op(self.peek().value) else {
            return Some(target);
        };
        let op_tok = self.advance();
        match self.ast.kind(target) {
            NodeKind::Identifier { .. } | NodeKind::Member { .. } | NodeKind::Index { .. } => {}
            NodeKind::Array { .. } | NodeKind::Object { .. } if op == AssignOp::Assign => {
                self.to_pattern(target)?;
            }
            _ => {
                self.error(op_tok, "Invalid assignment target.");
                return None;
            }
        }
        let value = self.parse_assignment()?;
        Some(self.make(NodeKind::Assign { op, target, value }, start))
    }

    fn parse_conditional(&mut self) -> Option<NodeId> {
        let start = self.peek();
        let test = self.parse_binary(1)?;
        if self.try_consume(Question).is_none() {
            return Some(test);
        }
        let no_in = core::mem::replace(&mut self.no_in, false);
        let then = self.parse_assignment();
        self.no_in = no_in;
        let then = then?;
        self.consume(Colon, "")?;
        let els = self.parse_assignment()?;
        Some(self.make(NodeKind::Conditional { test, then, els }, start))
    }

    /// Precedence climbing over binary and logical operators.
    fn parse_binary(&mut self, min_prec: u8) -> Option<NodeId> {
        let start = self.peek();
        let mut lhs = self.parse_unary()?;
        loop {
            let value = self.peek().value;
            if value == In && self.no_in {
                break;
            }
            if let Some((prec, op)) = logical_op(value) {
                if prec < min_prec {
                    break;
                }
                self.advance();
                let rhs = self.parse_binary(prec + 1)?;
                lhs = self.make(NodeKind::Logical { op, lhs, rhs }, start);
                continue;
            }
            let Some((prec, op)) = binary_op(value) else {
                break;
            };
            if prec < min_prec {
                break;
            }
            self.advance();
            // Exponentiation is right associative.
            let next = if op == BinaryOp::Exp { prec } else { prec + 1 };
            let rhs = self.parse_binary(next)?;
            lhs = self.make(NodeKind::Binary { op, lhs, rhs }, start);
        }
        Some(lhs)
    }

    fn parse_unary(&mut self) -> Option<NodeId> {
        let start = self.peek();
        let op = match start.value {
            Bang => Some(UnaryOp::Not),
            Minus => Some(UnaryOp::Neg),
            Plus => Some(UnaryOp::Plus),
            Tilde => Some(UnaryOp::BitNot),
            Typeof => Some(UnaryOp::Typeof),
            Void => Some(UnaryOp::Void),
            Delete => Some(UnaryOp::Delete),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let operand = self.parse_unary()?;
            return Some(self.make(NodeKind::Unary { op, operand }, start));
        }
        if let Some(tok) = self.match_tokens(&[PlusPlus, MinusMinus]) {
            let operand = self.parse_unary()?;
            return Some(self.make(
                NodeKind::Update {
                    increment: tok.value == PlusPlus,
                    prefix: true,
                    operand,
                },
                start,
            ));
        }
        if self.try_consume(Await).is_some() {
            let argument = self.parse_unary()?;
            return Some(self.make(NodeKind::Await { argument }, start));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Option<NodeId> {
        let start = self.peek();
        let operand = self.parse_call_member()?;
        let next = self.peek();
        if matches!(next.value, PlusPlus | MinusMinus) && !next.newline_before {
            self.advance();
            return Some(self.make(
                NodeKind::Update {
                    increment: next.value == PlusPlus,
                    prefix: false,
                    operand,
                },
                start,
            ));
        }
        Some(operand)
    }

    fn parse_call_member(&mut self) -> Option<NodeId> {
        let start = self.peek();
        let mut expr = if self.check(New) {
            self.parse_new()?
        } else {
            self.parse_primary()?
        };
        loop {
            match self.peek().value {
                Dot => {
                    self.advance();
                    let property = self.consume_property_name()?;
                    expr = self.make(
                        NodeKind::Member {
                            object: expr,
                            property,
                            optional: false,
                        },
                        start,
                    );
                }
                QuestionDot => {
                    self.advance();
                    expr = match self.peek().value {
                        LeftParen => {
                            let arguments = self.parse_arguments()?;
                            self.make(
                                NodeKind::Call {
                                    callee: expr,
                                    arguments,
                                    optional: true,
                                },
                                start,
                            )
                        }
                        LeftBracket => {
                            self.advance();
                            let index = self.parse_expression()?;
                            self.consume(RightBracket, "")?;
                            self.make(
                                NodeKind::Index {
                                    object: expr,
                                    index,
                                    optional: true,
                                },
                                start,
                            )
                        }
                        _ => {
                            let property = self.consume_property_name()?;
                            self.make(
                                NodeKind::Member {
                                    object: expr,
                                    property,
                                    optional: true,
                                },
                                start,
                            )
                        }
                    };
                }
                LeftBracket => {
                    self.advance();
                    let no_in = core::mem::replace(&mut self.no_in, false);
                    let index = self.parse_expression();
                    self.no_in = no_in;
                    let index = index?;
                    self.consume(RightBracket, "")?;
                    expr = self.make(
                        NodeKind::Index {
                            object: expr,
                            index,
                            optional: false,
                        },
                        start,
                    );
                }
                LeftParen => {
                    let arguments = self.parse_arguments()?;
                    expr = self.make(
                        NodeKind::Call {
                            callee: expr,
                            arguments,
                            optional: false,
                        },
                        start,
                    );
                }
                _ => break,
            }
        }
        Some(expr)
    }

    fn parse_new(&mut self) -> Option<NodeId> {
        let start = self.consume(New, "")?;
        let callee_start = self.peek();
        let mut callee = if self.check(New) {
            self.parse_new()?
        } else {
            self.parse_primary()?
        };
        while self.check(Dot) {
            self.advance();
            let property = self.consume_property_name()?;
            callee = self.make(
                NodeKind::Member {
                    object: callee,
                    property,
                    optional: false,
                },
                callee_start,
            );
        }
        let arguments = if self.check(LeftParen) {
            self.parse_arguments()?
        } else {
            Vec::new()
        };
        Some(self.make(NodeKind::New { callee, arguments }, start))
    }

    fn parse_arguments(&mut self) -> Option<Vec<NodeId>> {
        self.consume(LeftParen, "")?;
        let no_in = core::mem::replace(&mut self.no_in, false);
        let mut arguments = Vec::new();
        while !self.check(RightParen) {
            arguments.push(self.parse_element()?);
            if self.try_consume(Comma).is_none() {
                break;
            }
        }
        self.no_in = no_in;
        self.consume(RightParen, "")?;
        Some(arguments)
    }

    /// An argument or array element, possibly spread.
    fn parse_element(&mut self) -> Option<NodeId> {
        if let Some(dots) = self.try_consume(Ellipsis) {
            let argument = self.parse_assignment()?;
            return Some(self.make(NodeKind::Spread { argument }, dots));
        }
        self.parse_assignment()
    }

    fn parse_primary(&mut self) -> Option<NodeId> {
        let tok = self.peek();
        let kind = match tok.value {
            Number(text) => NodeKind::Number { text },
            Str(value) => NodeKind::Str { value },
            Template(quasi) => NodeKind::Template {
                quasis: vec![quasi],
                exprs: Vec::new(),
            },
            TemplateHead(_) => return self.parse_template(),
            True | False => NodeKind::Bool {
                value: tok.value == True,
            },
            Null => NodeKind::Null,
            Undefined => NodeKind::Undefined,
            This => NodeKind::This,
            Identifier(name) => NodeKind::Identifier { name },
            LeftParen => {
                self.advance();
                let no_in = core::mem::replace(&mut self.no_in, false);
                let inner = self.parse_expression();
                self.no_in = no_in;
                let inner = inner?;
                self.consume(RightParen, "")?;
                return Some(inner);
            }
            LeftBracket => return self.parse_array(),
            LeftBrace => return self.parse_object(),
            Function => return self.parse_function(false, false),
            Async if self.peek_next().value == Function => {
                self.advance();
                return self.parse_function(true, false);
            }
            _ => {
                self.error(tok, "Expect expression.");
                return None;
            }
        };
        self.advance();
        Some(self.make(kind, tok))
    }

    fn parse_template(&mut self) -> Option<NodeId> {
        let start = self.peek();
        let mut quasis = Vec::new();
        let mut exprs = Vec::new();
        let TemplateHead(head) = self.advance().value else {
            self.error(start, "Template expected.");
            return None;
        };
        quasis.push(head);
        loop {
            exprs.push(self.parse_expression()?);
            match self.advance().value {
                TemplateMiddle(quasi) => quasis.push(quasi),
                TemplateTail(quasi) => {
                    quasis.push(quasi);
                    break;
                }
                _ => {
                    self.error(self.previous(), "'}' expected in template literal.");
                    return None;
                }
            }
        }
        Some(self.make(NodeKind::Template { quasis, exprs }, start))
    }

    fn parse_array(&mut self) -> Option<NodeId> {
        let start = self.consume(LeftBracket, "")?;
        let no_in = core::mem::replace(&mut self.no_in, false);
        let mut elements = Vec::new();
        while !self.check(RightBracket) {
            if self.try_consume(Comma).is_some() {
                elements.push(None);
                continue;
            }
            elements.push(Some(self.parse_element()?));
            if self.try_consume(Comma).is_none() {
                break;
            }
        }
        self.no_in = no_in;
        self.consume(RightBracket, "")?;
        Some(self.make(NodeKind::Array { elements }, start))
    }

    fn parse_object(&mut self) -> Option<NodeId> {
        let start = self.consume(LeftBrace, "")?;
        let no_in = core::mem::replace(&mut self.no_in, false);
        let mut properties = Vec::new();
        while !self.check(RightBrace) {
            properties.push(self.parse_property()?);
            if self.try_consume(Comma).is_none() {
                break;
            }
        }
        self.no_in = no_in;
        self.consume(RightBrace, "")?;
        Some(self.make(NodeKind::Object { properties }, start))
    }

    fn parse_property(&mut self) -> Option<NodeId> {
        let start = self.peek();
        if let Some(dots) = self.try_consume(Ellipsis) {
            let argument = self.parse_assignment()?;
            return Some(self.make(NodeKind::Spread { argument }, dots));
        }

        let is_async = start.value == Async
            && !matches!(self.peek_next().value, LeftParen | Colon | Comma | RightBrace);
        if is_async {
            self.advance();
        }
        let (key, name_tok) = self.parse_property_key()?;

        if self.check(LeftParen) {
            let params = self.parse_params()?;
            let body = self.parse_block()?;
            let flags = FunctionFlags {
                is_async,
                ..FunctionFlags::default()
            };
            let value = self.make(
                NodeKind::Function {
                    name: None,
                    params,
                    body,
                    flags,
                },
                start,
            );
            return Some(self.make(
                NodeKind::Property {
                    key,
                    value,
                    shorthand: false,
                },
                start,
            ));
        }

        if self.try_consume(Colon).is_some() {
            let value = self.parse_assignment()?;
            return Some(self.make(
                NodeKind::Property {
                    key,
                    value,
                    shorthand: false,
                },
                start,
            ));
        }

        let (PropKey::Named(name), Some(name_tok)) = (key, name_tok) else {
            self.error(self.peek(), "':' expected.");
            return None;
        };
        let mut value = self.make(NodeKind::Identifier { name }, name_tok);
        // `{ a = 1 }` is only valid as a destructuring target.
        if self.try_consume(Assign).is_some() {
            let default = self.parse_assignment()?;
            value = self.make(
                NodeKind::Assign {
                    op: AssignOp::Assign,
                    target: value,
                    value: default,
                },
                name_tok,
            );
        }
        Some(self.make(
            NodeKind::Property {
                key,
                value,
                shorthand: true,
            },
            start,
        ))
    }

    /// The key of an object literal or pattern property. For plain
    /// identifier keys the token is returned too, shorthand properties
    /// need it.
    fn parse_property_key(&mut self) -> Option<(PropKey, Option<Token>)> {
        let tok = self.peek();
        match tok.value {
            LeftBracket => {
                self.advance();
                let key = self.parse_assignment()?;
                self.consume(RightBracket, "")?;
                Some((PropKey::Computed(key), None))
            }
            Identifier(name) => {
                self.advance();
                Some((PropKey::Named(name), Some(tok)))
            }
            _ => {
                let name = self.consume_property_name()?;
                Some((PropKey::Named(name), None))
            }
        }
    }

    ///////////////
    //  Helpers  //
    ///////////////

    fn make(&mut self, kind: NodeKind, start: Token) -> NodeId {
        let end = if self.current_tok > 0 {
            self.previous().end.max(start.end)
        } else {
            start.end
        };
        self.ast
            .add_node(kind, self.module, start.line_num.0, (start.start, end))
    }

    fn peek(&self) -> Token {
        self.tokens[self.current_tok]
    }

    fn peek_next(&self) -> Token {
        let idx = (self.current_tok + 1).min(self.tokens.len() - 1);
        self.tokens[idx]
    }

    fn previous(&self) -> Token {
        self.tokens[self.current_tok - 1]
    }

    fn is_at_end(&self) -> bool {
        matches!(self.peek().value, EndOfFile)
    }

    fn check(&self, tok_val: TokenValue) -> bool {
        if self.is_at_end() {
            false
        } else {
            core::mem::discriminant(&self.peek().value) == core::mem::discriminant(&tok_val)
        }
    }

    /// Contextual keywords like `of`, `as` and `from` are identifiers.
    fn check_word(&self, word: &str) -> bool {
        match self.peek().value {
            Identifier(name) => self.ast.name(name) == word,
            _ => false,
        }
    }

    fn match_tokens(&mut self, tok_vals: &[TokenValue]) -> Option<Token> {
        if tok_vals.iter().any(|val| self.check(*val)) {
            let prev = self.advance();
            return Some(prev);
        }
        None
    }

    fn advance(&mut self) -> Token {
        if !self.is_at_end() {
            self.current_tok += 1;
        }
        self.previous()
    }

    fn consume(&mut self, tok_val: TokenValue, s: &str) -> Option<Token> {
        if self.check(tok_val) {
            return Some(self.advance());
        }
        let msg = if s.is_empty() {
            format!("'{tok_val}' expected.")
        } else {
            s.to_owned()
        };
        self.error(self.peek(), &msg);
        None
    }

    fn consume_identifier(&mut self) -> Option<Symbol> {
        if let Identifier(name) = self.peek().value {
            self.advance();
            return Some(name);
        }
        self.error(self.peek(), "Identifier expected.");
        None
    }

    fn consume_string(&mut self) -> Option<Symbol> {
        if let Str(value) = self.peek().value {
            self.advance();
            return Some(value);
        }
        self.error(self.peek(), "String literal expected.");
        None
    }

    /// Property names can be identifiers, keywords, strings or numbers.
    fn consume_property_name(&mut self) -> Option<Symbol> {
        let tok = self.peek();
        let name = match tok.value {
            Identifier(name) | Str(name) | Number(name) => name,
            value => {
                let Some(kw) = value.keyword_text() else {
                    self.error(tok, "Property name expected.");
                    return None;
                };
                self.ast.identifiers.intern(kw)
            }
        };
        self.advance();
        Some(name)
    }

    fn try_consume(&mut self, tok_val: TokenValue) -> Option<Token> {
        if self.check(tok_val) {
            return Some(self.advance());
        }
        None
    }

    fn at_statement_end(&self) -> bool {
        let tok = self.peek();
        matches!(tok.value, Semicolon | RightBrace | EndOfFile) || tok.newline_before
    }

    /// Semicolons are optional before a line break, a `}` and at the end.
    fn consume_semicolon(&mut self) -> Option<()> {
        if self.try_consume(Semicolon).is_some() || self.at_statement_end() {
            return Some(());
        }
        self.error(self.peek(), "';' expected.");
        None
    }

    fn error(&mut self, tok: Token, s: &str) {
        match tok.value {
            Identifier(sym) | Number(sym) | Str(sym) => {
                let text = self.ast.name(sym).to_owned();
                self.diag.report(tok.line_num.0, &format!("at '{text}'"), s);
            }
            _ => tok.error(self.diag, s),
        }
    }
}
