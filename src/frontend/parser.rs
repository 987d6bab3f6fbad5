//! Recursive descent parser for M.
//!
//! Precedence, loosest to tightest: logical (`&&` `||`), comparison,
//! term (`+` `-`), factor (`*` `/` `%`), unary, primary. The parenthesized
//! cast form `( expr as : type )` is disambiguated from plain grouping after
//! the inner expression has been consumed.
//!
//! Syntax errors are reported to the diagnostics sink and abort the parse;
//! recovery is deliberately out of scope.

use std::str::FromStr;

use crate::{
    frontend::{
        ast::{
            BinaryOperatorKind, Expression, ExpressionKind, ExternFunctionDecl, FunctionDecl,
            Identifier, Item, Parameter, Program, Statement, StatementKind, TypeName,
            UnaryOperatorKind, VariableDecl,
        },
        lexer::{Keyword, Lexer, Token, TokenKind},
        SourceFile,
    },
    middle::{
        diagnostics::{DiagnosticKind, DiagnosticSink},
        primitive::PrimitiveType,
    },
};

/// Marker for an abandoned parse; the diagnostic is already in the sink
#[derive(Debug)]
pub struct ParseAbort;

type ParseResult<T> = Result<T, ParseAbort>;

pub struct Parser<'sink> {
    tokens: Vec<Token>,
    position: usize,
    sink: &'sink mut DiagnosticSink,
}

impl<'sink> Parser<'sink> {
    /// Lexes and parses a whole source file. `None` means the sink holds at
    /// least one syntax error.
    pub fn parse_program(source: &SourceFile, sink: &'sink mut DiagnosticSink) -> Option<Program> {
        let tokens = Lexer::new(source).tokenize(sink);

        if sink.has_errors() {
            return None;
        }

        let mut parser = Self {
            tokens,
            position: 0,
            sink,
        };

        let mut items = Vec::new();

        while parser.peek().is_some() {
            match parser.parse_item() {
                Ok(item) => items.push(item),
                Err(ParseAbort) => return None,
            }
        }

        Some(Program { items })
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn peek_nth(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.position + n)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        self.position += 1;
        token
    }

    /// Position of the last consumed token, for end-of-file reports
    fn last_position(&self) -> (usize, usize) {
        self.tokens
            .last()
            .map(|t| (t.line, t.column))
            .unwrap_or((1, 1))
    }

    fn error(&mut self, message: String, line: usize, column: usize) -> ParseAbort {
        self.sink
            .error(DiagnosticKind::SyntaxError, message, line, column);
        ParseAbort
    }

    fn expect_next(&mut self, expecting: &str) -> ParseResult<Token> {
        match self.advance() {
            Some(token) => Ok(token),
            None => {
                let (line, column) = self.last_position();
                Err(self.error(
                    format!("Expected {expecting} but reached end of file"),
                    line,
                    column,
                ))
            }
        }
    }

    fn expect_next_to_be(&mut self, kind: TokenKind, expecting: &str) -> ParseResult<Token> {
        let token = self.expect_next(expecting)?;

        if token.kind != kind {
            return Err(self.error(
                format!("Expected {expecting} but found '{}'", token.text),
                token.line,
                token.column,
            ));
        }

        Ok(token)
    }

    fn expect_identifier(&mut self) -> ParseResult<Identifier> {
        let token = self.expect_next_to_be(TokenKind::Identifier, "an identifier")?;

        Ok(Identifier {
            name: token.text,
            line: token.line,
            column: token.column,
        })
    }

    /// Type names outside the closed primitive set fold to `unknown`; the
    /// analyzer reports them with a position, which the parser cannot judge.
    fn expect_type(&mut self) -> ParseResult<TypeName> {
        let token = self.expect_next_to_be(TokenKind::Identifier, "a type name")?;

        Ok(TypeName {
            ty: PrimitiveType::from_str(&token.text).unwrap_or(PrimitiveType::Unknown),
            line: token.line,
            column: token.column,
        })
    }

    fn parse_item(&mut self) -> ParseResult<Item> {
        let token = self.peek().expect("caller checked for a token");

        match token.kind {
            // functionDecl := ':' IDENT '(' params? ')' ':' type '{' stmt* '}'
            TokenKind::Colon => Ok(Item::Function(self.parse_function_decl()?)),
            // externFunctionDecl := 'extern' ':' IDENT '(' params? ')' ':' type ';'
            TokenKind::Keyword(Keyword::Extern) => {
                Ok(Item::ExternFunction(self.parse_extern_function_decl()?))
            }
            TokenKind::Identifier => Ok(Item::Variable(self.parse_variable_decl()?)),
            _ => {
                let (line, column, text) = (token.line, token.column, token.text.clone());
                Err(self.error(
                    format!("Expected a declaration but found '{text}'"),
                    line,
                    column,
                ))
            }
        }
    }

    fn parse_function_decl(&mut self) -> ParseResult<FunctionDecl> {
        let colon = self.expect_next_to_be(TokenKind::Colon, "':'")?;
        let name = self.expect_identifier()?;
        let parameters = self.parse_parameter_list()?;
        self.expect_next_to_be(TokenKind::Colon, "':' before the return type")?;
        let return_type = self.expect_type()?;

        self.expect_next_to_be(TokenKind::OpenBrace, "'{'")?;
        let mut body = Vec::new();

        while self.peek().is_some_and(|t| t.kind != TokenKind::CloseBrace) {
            body.push(self.parse_statement()?);
        }

        self.expect_next_to_be(TokenKind::CloseBrace, "'}'")?;

        Ok(FunctionDecl {
            name,
            parameters,
            return_type,
            body,
            line: colon.line,
            column: colon.column,
        })
    }

    fn parse_extern_function_decl(&mut self) -> ParseResult<ExternFunctionDecl> {
        let extern_keyword = self.expect_next_to_be(TokenKind::Keyword(Keyword::Extern), "'extern'")?;
        self.expect_next_to_be(TokenKind::Colon, "':'")?;
        let name = self.expect_identifier()?;
        let parameters = self.parse_parameter_list()?;
        self.expect_next_to_be(TokenKind::Colon, "':' before the return type")?;
        let return_type = self.expect_type()?;
        self.expect_next_to_be(TokenKind::Semicolon, "';'")?;

        Ok(ExternFunctionDecl {
            name,
            parameters,
            return_type,
            line: extern_keyword.line,
            column: extern_keyword.column,
        })
    }

    fn parse_parameter_list(&mut self) -> ParseResult<Vec<Parameter>> {
        self.expect_next_to_be(TokenKind::OpenParen, "'('")?;

        let mut parameters = Vec::new();

        if self.peek().is_some_and(|t| t.kind != TokenKind::CloseParen) {
            loop {
                let name = self.expect_identifier()?;
                self.expect_next_to_be(TokenKind::Colon, "':' after the parameter name")?;
                let ty = self.expect_type()?;

                parameters.push(Parameter {
                    line: name.line,
                    column: name.column,
                    name,
                    ty,
                });

                if self.peek().is_some_and(|t| t.kind == TokenKind::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
        }

        self.expect_next_to_be(TokenKind::CloseParen, "')'")?;

        Ok(parameters)
    }

    /// variableDecl := IDENT ':' type '=' expr ';'
    fn parse_variable_decl(&mut self) -> ParseResult<VariableDecl> {
        let name = self.expect_identifier()?;
        self.expect_next_to_be(TokenKind::Colon, "':' after the variable name")?;
        let ty = self.expect_type()?;
        self.expect_next_to_be(TokenKind::Equals, "'='")?;
        let initializer = self.parse_expression()?;
        self.expect_next_to_be(TokenKind::Semicolon, "';'")?;

        Ok(VariableDecl {
            line: name.line,
            column: name.column,
            name,
            ty,
            initializer,
        })
    }

    fn parse_statement(&mut self) -> ParseResult<Statement> {
        let token = match self.peek() {
            Some(token) => token.clone(),
            None => {
                let (line, column) = self.last_position();
                return Err(self.error(
                    "Expected a statement but reached end of file".to_string(),
                    line,
                    column,
                ));
            }
        };

        let (line, column) = (token.line, token.column);

        let kind = match token.kind {
            TokenKind::Keyword(Keyword::If) => self.parse_if_statement()?,
            TokenKind::Keyword(Keyword::While) => self.parse_while_statement()?,
            TokenKind::Keyword(Keyword::For) => self.parse_for_statement()?,
            TokenKind::Keyword(Keyword::Return) => {
                self.advance();

                let value = if self.peek().is_some_and(|t| t.kind != TokenKind::Semicolon) {
                    Some(self.parse_expression()?)
                } else {
                    None
                };

                self.expect_next_to_be(TokenKind::Semicolon, "';'")?;
                StatementKind::Return(value)
            }
            TokenKind::OpenBrace => {
                self.advance();

                let mut statements = Vec::new();
                while self.peek().is_some_and(|t| t.kind != TokenKind::CloseBrace) {
                    statements.push(self.parse_statement()?);
                }

                self.expect_next_to_be(TokenKind::CloseBrace, "'}'")?;
                StatementKind::Block(statements)
            }
            TokenKind::Identifier => {
                // IDENT ':' starts a declaration, IDENT '=' an assignment;
                // anything else is an expression statement
                match self.peek_nth(1).map(|t| t.kind) {
                    Some(TokenKind::Colon) => {
                        StatementKind::VariableDecl(self.parse_variable_decl()?)
                    }
                    Some(TokenKind::Equals) => {
                        let (target, value) = self.parse_assignment_head()?;
                        self.expect_next_to_be(TokenKind::Semicolon, "';'")?;
                        StatementKind::Assignment { target, value }
                    }
                    _ => {
                        let expression = self.parse_expression()?;
                        self.expect_next_to_be(TokenKind::Semicolon, "';'")?;
                        StatementKind::Expression(expression)
                    }
                }
            }
            _ => {
                let expression = self.parse_expression()?;
                self.expect_next_to_be(TokenKind::Semicolon, "';'")?;
                StatementKind::Expression(expression)
            }
        };

        Ok(Statement { kind, line, column })
    }

    /// IDENT '=' expr, shared by assignment statements and `for` clauses
    fn parse_assignment_head(&mut self) -> ParseResult<(Identifier, Expression)> {
        let target = self.expect_identifier()?;
        self.expect_next_to_be(TokenKind::Equals, "'='")?;
        let value = self.parse_expression()?;

        Ok((target, value))
    }

    fn parse_if_statement(&mut self) -> ParseResult<StatementKind> {
        self.advance();
        self.expect_next_to_be(TokenKind::OpenParen, "'('")?;
        let condition = self.parse_expression()?;
        self.expect_next_to_be(TokenKind::CloseParen, "')'")?;

        let positive = Box::new(self.parse_statement()?);

        let negative = if self
            .peek()
            .is_some_and(|t| t.kind == TokenKind::Keyword(Keyword::Else))
        {
            self.advance();
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };

        Ok(StatementKind::If {
            condition,
            positive,
            negative,
        })
    }

    fn parse_while_statement(&mut self) -> ParseResult<StatementKind> {
        self.advance();
        self.expect_next_to_be(TokenKind::OpenParen, "'('")?;
        let condition = self.parse_expression()?;
        self.expect_next_to_be(TokenKind::CloseParen, "')'")?;
        let body = Box::new(self.parse_statement()?);

        Ok(StatementKind::While { condition, body })
    }

    /// for '(' init? ';' cond? ';' step? ')' stmt
    fn parse_for_statement(&mut self) -> ParseResult<StatementKind> {
        self.advance();
        self.expect_next_to_be(TokenKind::OpenParen, "'('")?;

        let init = if self.peek().is_some_and(|t| t.kind != TokenKind::Semicolon) {
            let name = self.peek().cloned();
            let kind = match self.peek_nth(1).map(|t| t.kind) {
                Some(TokenKind::Colon) => {
                    let decl = self.parse_variable_decl_without_semicolon()?;
                    StatementKind::VariableDecl(decl)
                }
                _ => {
                    let (target, value) = self.parse_assignment_head()?;
                    StatementKind::Assignment { target, value }
                }
            };

            let position = name.expect("peeked above");
            Some(Box::new(Statement {
                kind,
                line: position.line,
                column: position.column,
            }))
        } else {
            None
        };
        self.expect_next_to_be(TokenKind::Semicolon, "';'")?;

        let condition = if self.peek().is_some_and(|t| t.kind != TokenKind::Semicolon) {
            Some(self.parse_expression()?)
        } else {
            None
        };
        self.expect_next_to_be(TokenKind::Semicolon, "';'")?;

        let step = if self.peek().is_some_and(|t| t.kind != TokenKind::CloseParen) {
            let position = self.peek().cloned().expect("peeked above");
            let (target, value) = self.parse_assignment_head()?;

            Some(Box::new(Statement {
                kind: StatementKind::Assignment { target, value },
                line: position.line,
                column: position.column,
            }))
        } else {
            None
        };
        self.expect_next_to_be(TokenKind::CloseParen, "')'")?;

        let body = Box::new(self.parse_statement()?);

        Ok(StatementKind::For {
            init,
            condition,
            step,
            body,
        })
    }

    fn parse_variable_decl_without_semicolon(&mut self) -> ParseResult<VariableDecl> {
        let name = self.expect_identifier()?;
        self.expect_next_to_be(TokenKind::Colon, "':' after the variable name")?;
        let ty = self.expect_type()?;
        self.expect_next_to_be(TokenKind::Equals, "'='")?;
        let initializer = self.parse_expression()?;

        Ok(VariableDecl {
            line: name.line,
            column: name.column,
            name,
            ty,
            initializer,
        })
    }

    pub fn parse_expression(&mut self) -> ParseResult<Expression> {
        self.parse_logical()
    }

    fn parse_logical(&mut self) -> ParseResult<Expression> {
        let mut lhs = self.parse_comparison()?;

        while let Some(operator) = self.peek().and_then(|t| match t.kind {
            TokenKind::LogicalAnd => Some(BinaryOperatorKind::LogicalAnd),
            TokenKind::LogicalOr => Some(BinaryOperatorKind::LogicalOr),
            _ => None,
        }) {
            self.advance();
            let rhs = self.parse_comparison()?;
            lhs = binary(lhs, operator, rhs);
        }

        Ok(lhs)
    }

    fn parse_comparison(&mut self) -> ParseResult<Expression> {
        let mut lhs = self.parse_term()?;

        while self.peek().is_some_and(|t| t.kind.is_comparison_operator()) {
            let operator = match self.advance().expect("peeked above").kind {
                TokenKind::DoubleEquals => BinaryOperatorKind::Equals,
                TokenKind::NotEquals => BinaryOperatorKind::NotEquals,
                TokenKind::LessThan => BinaryOperatorKind::LessThan,
                TokenKind::LessThanOrEqualTo => BinaryOperatorKind::LessThanOrEqualTo,
                TokenKind::GreaterThan => BinaryOperatorKind::GreaterThan,
                TokenKind::GreaterThanOrEqualTo => BinaryOperatorKind::GreaterThanOrEqualTo,
                _ => unreachable!("is_comparison_operator covers these"),
            };

            let rhs = self.parse_term()?;
            lhs = binary(lhs, operator, rhs);
        }

        Ok(lhs)
    }

    fn parse_term(&mut self) -> ParseResult<Expression> {
        let mut lhs = self.parse_factor()?;

        while self.peek().is_some_and(|t| t.kind.is_term_operator()) {
            let operator = match self.advance().expect("peeked above").kind {
                TokenKind::Plus => BinaryOperatorKind::Add,
                TokenKind::Minus => BinaryOperatorKind::Subtract,
                _ => unreachable!("is_term_operator covers these"),
            };

            let rhs = self.parse_factor()?;
            lhs = binary(lhs, operator, rhs);
        }

        Ok(lhs)
    }

    fn parse_factor(&mut self) -> ParseResult<Expression> {
        let mut lhs = self.parse_unary()?;

        while self.peek().is_some_and(|t| t.kind.is_factor_operator()) {
            let operator = match self.advance().expect("peeked above").kind {
                TokenKind::Asterisk => BinaryOperatorKind::Multiply,
                TokenKind::Divide => BinaryOperatorKind::Divide,
                TokenKind::Modulus => BinaryOperatorKind::Modulus,
                _ => unreachable!("is_factor_operator covers these"),
            };

            let rhs = self.parse_unary()?;
            lhs = binary(lhs, operator, rhs);
        }

        Ok(lhs)
    }

    fn parse_unary(&mut self) -> ParseResult<Expression> {
        let operator = self.peek().and_then(|t| match t.kind {
            TokenKind::Bang => Some(UnaryOperatorKind::LogicalNot),
            TokenKind::Minus => Some(UnaryOperatorKind::Negate),
            _ => None,
        });

        if let Some(operator) = operator {
            let token = self.advance().expect("peeked above");
            let operand = Box::new(self.parse_unary()?);

            return Ok(Expression {
                kind: ExpressionKind::Unary { operator, operand },
                line: token.line,
                column: token.column,
            });
        }

        self.parse_primary()
    }

    fn parse_primary(&mut self) -> ParseResult<Expression> {
        let token = self.expect_next("an expression")?;
        let (line, column) = (token.line, token.column);

        let kind = match token.kind {
            TokenKind::IntegerLiteral => match token.text.parse::<i64>() {
                Ok(value) => ExpressionKind::IntegerLiteral(value),
                Err(_) => {
                    return Err(self.error(
                        format!("Integer literal '{}' is out of range", token.text),
                        line,
                        column,
                    ));
                }
            },
            TokenKind::FloatLiteral => match token.text.parse::<f64>() {
                Ok(value) => ExpressionKind::FloatLiteral(value),
                Err(_) => {
                    return Err(self.error(
                        format!("Invalid float literal '{}'", token.text),
                        line,
                        column,
                    ));
                }
            },
            TokenKind::StringLiteral => ExpressionKind::StringLiteral(token.text),
            TokenKind::BooleanLiteral => ExpressionKind::BooleanLiteral(token.text == "true"),
            TokenKind::Identifier => {
                if self.peek().is_some_and(|t| t.kind == TokenKind::OpenParen) {
                    let callee = Identifier {
                        name: token.text,
                        line,
                        column,
                    };
                    let arguments = self.parse_argument_list()?;

                    ExpressionKind::Call { callee, arguments }
                } else {
                    ExpressionKind::Identifier(token.text)
                }
            }
            // Either a grouping '(' expr ')' or a cast '(' expr 'as' ':' type ')'
            TokenKind::OpenParen => {
                let inner = self.parse_expression()?;

                if self
                    .peek()
                    .is_some_and(|t| t.kind == TokenKind::Keyword(Keyword::As))
                {
                    self.advance();
                    self.expect_next_to_be(TokenKind::Colon, "':' after 'as'")?;
                    let ty = self.expect_type()?;
                    self.expect_next_to_be(TokenKind::CloseParen, "')'")?;

                    ExpressionKind::Cast {
                        operand: Box::new(inner),
                        ty,
                    }
                } else {
                    self.expect_next_to_be(TokenKind::CloseParen, "')'")?;
                    return Ok(inner);
                }
            }
            _ => {
                return Err(self.error(
                    format!("Expected an expression but found '{}'", token.text),
                    line,
                    column,
                ));
            }
        };

        Ok(Expression { kind, line, column })
    }

    fn parse_argument_list(&mut self) -> ParseResult<Vec<Expression>> {
        self.expect_next_to_be(TokenKind::OpenParen, "'('")?;

        let mut arguments = Vec::new();

        if self.peek().is_some_and(|t| t.kind != TokenKind::CloseParen) {
            loop {
                arguments.push(self.parse_expression()?);

                if self.peek().is_some_and(|t| t.kind == TokenKind::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
        }

        self.expect_next_to_be(TokenKind::CloseParen, "')'")?;

        Ok(arguments)
    }
}

fn binary(lhs: Expression, operator: BinaryOperatorKind, rhs: Expression) -> Expression {
    let (line, column) = (lhs.line, lhs.column);

    Expression {
        kind: ExpressionKind::Binary {
            lhs: Box::new(lhs),
            operator,
            rhs: Box::new(rhs),
        },
        line,
        column,
    }
}
