use std::iter::Peekable;

use log::{debug, info};
use thiserror::Error;

use crate::ast::{
    BinaryLogicalOperator, BinaryOperator, Expr, Function, Literal, Parameter, Program,
    Statement, UnaryOperator,
};
use crate::token::{Position, Token, TokenType};

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ParserError {
    #[error("Expect {expected}, found {found}.")]
    UnexpectedToken {
        expected: String,
        found: String,
        position: Position,
    },
    #[error("Invalid assignment target.")]
    InvalidAssignmentTarget { position: Position },
}

impl ParserError {
    pub fn position(&self) -> Position {
        match self {
            ParserError::UnexpectedToken { position, .. }
            | ParserError::InvalidAssignmentTarget { position } => *position,
        }
    }
}

const EQUALITY_OPERATORS: [(TokenType, BinaryOperator); 2] = [
    (TokenType::BangEqual, BinaryOperator::Neq),
    (TokenType::EqualEqual, BinaryOperator::Eq),
];
const COMPARISON_OPERATORS: [(TokenType, BinaryOperator); 4] = [
    (TokenType::Greater, BinaryOperator::Gt),
    (TokenType::GreaterEqual, BinaryOperator::Gte),
    (TokenType::Less, BinaryOperator::Lt),
    (TokenType::LessEqual, BinaryOperator::Lte),
];
const TERM_OPERATORS: [(TokenType, BinaryOperator); 2] = [
    (TokenType::Plus, BinaryOperator::Plus),
    (TokenType::Minus, BinaryOperator::Minus),
];
// deepest nesting of statements, groupings, calls and prefix operators before parsing gives up.
const MAX_NESTING: usize = 128;

const FACTOR_OPERATORS: [(TokenType, BinaryOperator); 2] = [
    (TokenType::Star, BinaryOperator::Multiply),
    (TokenType::Slash, BinaryOperator::Divide),
];

/// Recursive descent parser with one token of lookahead.
pub struct Parser<I: Iterator<Item = Token>> {
    tokens: Peekable<I>,
    // position of the last consumed token, reported when the stream runs out.
    last_position: Position,
    // errors recovered from so far
    errors: Vec<ParserError>,
    // number of `{ ... }` currently open. Recovery never swallows the `}` of an open block.
    block_depth: usize,
    // current recursion depth, bounded by MAX_NESTING
    nesting: usize,
}

impl<I: Iterator<Item = Token>> Parser<I> {
    pub fn new(tokens: I) -> Parser<I> {
        Parser {
            tokens: tokens.peekable(),
            last_position: Position::new(1, 1),
            errors: vec![],
            block_depth: 0,
            nesting: 0,
        }
    }

    /// Parse declarations until the end of input.
    /// On error, skips to the next statement boundary and keeps going so all errors are reported.
    pub fn parse_program(&mut self) -> Result<Program, Vec<ParserError>> {
        info!("parsing program");
        let mut declarations = vec![];
        while !self.is_at_end() {
            if let Some(declaration) = self.declaration_or_recover() {
                declarations.push(declaration);
            }
        }

        if self.errors.is_empty() {
            info!("parsed {} top-level declarations", declarations.len());
            Ok(Program { declarations })
        } else {
            info!("parsing failed with {} errors", self.errors.len());
            Err(std::mem::take(&mut self.errors))
        }
    }

    /// Parse a single declaration, reporting the first error.
    /// Anything left after it is an error too.
    pub fn parse_statement(&mut self) -> Result<Statement, ParserError> {
        let statement = self.declaration();
        let statement = self.first_error_or(statement)?;
        self.consume_end()?;
        Ok(statement)
    }

    pub fn parse_expression(&mut self) -> Result<Expr, ParserError> {
        let expr = self.expression();
        let expr = self.first_error_or(expr)?;
        self.consume_end()?;
        Ok(expr)
    }

    fn consume_end(&mut self) -> Result<(), ParserError> {
        if self.is_at_end() {
            Ok(())
        } else {
            Err(self.error_at_current("end of input"))
        }
    }

    fn first_error_or<T>(&mut self, result: Result<T, ParserError>) -> Result<T, ParserError> {
        if self.errors.is_empty() {
            result
        } else {
            Err(self.errors.remove(0))
        }
    }

    fn declaration_or_recover(&mut self) -> Option<Statement> {
        match self.declaration() {
            Ok(statement) => Some(statement),
            Err(error) => {
                debug!("recovering from: {error} at {}", error.position());
                self.errors.push(error);
                self.synchronize();
                None
            }
        }
    }

    /// Discard tokens until the end of the current statement, or the start of the next one.
    /// The offending token is always discarded, unless it closes an open block.
    fn synchronize(&mut self) {
        if self.check(TokenType::RightBrace) && self.block_depth > 0 {
            return;
        }
        if self.advance().r#type == TokenType::Semicolon {
            return;
        }
        loop {
            match self.peek_type() {
                TokenType::EOF => return,
                TokenType::RightBrace if self.block_depth > 0 => return,
                TokenType::Semicolon => {
                    self.advance();
                    return;
                }
                token_type if token_type.starts_statement() => return,
                _ => {
                    self.advance();
                }
            }
        }
    }

    fn declaration(&mut self) -> Result<Statement, ParserError> {
        debug!("declaration starting with {:?}", self.peek_type());
        if self.match_current(&[TokenType::Var]).is_some() {
            self.var_declaration()
        } else if self.match_current(&[TokenType::Fun]).is_some() {
            Ok(Statement::FunctionDeclaration(self.function("function")?))
        } else if self.match_current(&[TokenType::Class]).is_some() {
            self.class_declaration()
        } else {
            self.statement()
        }
    }

    fn var_declaration(&mut self) -> Result<Statement, ParserError> {
        let name = self.consume(TokenType::Identifier, "variable name")?;
        let initializer = match self.match_current(&[TokenType::Equal]) {
            Some(_) => Some(self.expression()?),
            None => None,
        };
        self.consume(TokenType::Semicolon, "';' after variable declaration")?;
        Ok(Statement::VarDeclaration {
            name: name.lexeme,
            initializer,
            line: name.position.line,
        })
    }

    /// `kind` is "function" or "method", only used in error messages.
    fn function(&mut self, kind: &str) -> Result<Function, ParserError> {
        let name = self.consume(TokenType::Identifier, &format!("{kind} name"))?;
        self.consume(TokenType::LeftParen, &format!("'(' after {kind} name"))?;
        let mut parameters = vec![];
        if !self.check(TokenType::RightParen) {
            loop {
                let parameter = self.consume(TokenType::Identifier, "parameter name")?;
                parameters.push(Parameter {
                    name: parameter.lexeme,
                    line: parameter.position.line,
                });
                if self.match_current(&[TokenType::Comma]).is_none() {
                    break;
                }
            }
        }
        self.consume(TokenType::RightParen, "')' after parameters")?;
        self.consume(TokenType::LeftBrace, &format!("'{{' before {kind} body"))?;
        let body = self.block()?;
        Ok(Function {
            name: name.lexeme,
            parameters,
            body,
            line: name.position.line,
        })
    }

    fn class_declaration(&mut self) -> Result<Statement, ParserError> {
        let name = self.consume(TokenType::Identifier, "class name")?;
        let superclass = match self.match_current(&[TokenType::Less]) {
            Some(_) => Some(self.consume(TokenType::Identifier, "superclass name")?.lexeme),
            None => None,
        };
        self.consume(TokenType::LeftBrace, "'{' before class body")?;
        // recovers per method, like a block does per declaration.
        self.block_depth += 1;
        let mut methods = vec![];
        while !self.check(TokenType::RightBrace) && !self.is_at_end() {
            match self.function("method") {
                Ok(method) => methods.push(method),
                Err(error) => {
                    debug!("recovering in class body from: {error} at {}", error.position());
                    self.errors.push(error);
                    self.synchronize();
                }
            }
        }
        self.block_depth -= 1;
        self.consume(TokenType::RightBrace, "'}' after class body")?;
        Ok(Statement::ClassDeclaration {
            name: name.lexeme,
            superclass,
            methods,
            line: name.position.line,
        })
    }

    fn statement(&mut self) -> Result<Statement, ParserError> {
        self.nested(Self::unnested_statement)
    }

    fn unnested_statement(&mut self) -> Result<Statement, ParserError> {
        if self.match_current(&[TokenType::For]).is_some() {
            self.for_statement()
        } else if self.match_current(&[TokenType::If]).is_some() {
            self.if_statement()
        } else if self.match_current(&[TokenType::While]).is_some() {
            self.while_statement()
        } else if let Some(keyword) = self.match_current(&[TokenType::Return]) {
            self.return_statement(keyword)
        } else if self.match_current(&[TokenType::LeftBrace]).is_some() {
            Ok(Statement::Block {
                statements: self.block()?,
            })
        } else if self.match_current(&[TokenType::Print]).is_some() {
            self.print_statement()
        } else {
            self.expression_statement()
        }
    }

    /// `for` has no node of its own: it becomes a block holding the initializer and a while loop.
    fn for_statement(&mut self) -> Result<Statement, ParserError> {
        self.consume(TokenType::LeftParen, "'(' after 'for'")?;
        let initializer = if self.match_current(&[TokenType::Semicolon]).is_some() {
            None
        } else if self.match_current(&[TokenType::Var]).is_some() {
            Some(self.var_declaration()?)
        } else {
            Some(self.expression_statement()?)
        };

        let condition = if self.check(TokenType::Semicolon) {
            None
        } else {
            Some(self.expression()?)
        };
        self.consume(TokenType::Semicolon, "';' after loop condition")?;

        let increment = if self.check(TokenType::RightParen) {
            None
        } else {
            Some(self.expression()?)
        };
        self.consume(TokenType::RightParen, "')' after for clauses")?;

        let mut body = self.statement()?;
        if let Some(increment) = increment {
            body = Statement::Block {
                statements: vec![
                    body,
                    Statement::ExprStatement {
                        expression: increment,
                    },
                ],
            };
        }
        let while_statement = Statement::WhileStatement {
            condition: condition.unwrap_or(Expr::Literal(Literal::Bool(true))),
            body: Box::new(body),
        };

        let mut statements: Vec<Statement> = initializer.into_iter().collect();
        statements.push(while_statement);
        Ok(Statement::Block { statements })
    }

    fn if_statement(&mut self) -> Result<Statement, ParserError> {
        self.consume(TokenType::LeftParen, "'(' after 'if'")?;
        let condition = self.expression()?;
        self.consume(TokenType::RightParen, "')' after if condition")?;
        let then_branch = Box::new(self.statement()?);
        // an `else` always belongs to the closest `if`: the innermost call claims it first.
        let else_branch = match self.match_current(&[TokenType::Else]) {
            Some(_) => Some(Box::new(self.statement()?)),
            None => None,
        };
        Ok(Statement::IfStatement {
            condition,
            then_branch,
            else_branch,
        })
    }

    fn while_statement(&mut self) -> Result<Statement, ParserError> {
        self.consume(TokenType::LeftParen, "'(' after 'while'")?;
        let condition = self.expression()?;
        self.consume(TokenType::RightParen, "')' after condition")?;
        let body = Box::new(self.statement()?);
        Ok(Statement::WhileStatement { condition, body })
    }

    fn return_statement(&mut self, keyword: Token) -> Result<Statement, ParserError> {
        let value = if self.check(TokenType::Semicolon) {
            None
        } else {
            Some(self.expression()?)
        };
        self.consume(TokenType::Semicolon, "';' after return value")?;
        Ok(Statement::ReturnStatement {
            value,
            line: keyword.position.line,
        })
    }

    fn print_statement(&mut self) -> Result<Statement, ParserError> {
        let expression = self.expression()?;
        self.consume(TokenType::Semicolon, "';' after value")?;
        Ok(Statement::PrintStatement { expression })
    }

    fn expression_statement(&mut self) -> Result<Statement, ParserError> {
        let expression = self.expression()?;
        self.consume(TokenType::Semicolon, "';' after expression")?;
        Ok(Statement::ExprStatement { expression })
    }

    /// Assumes the opening brace was consumed.
    fn block(&mut self) -> Result<Vec<Statement>, ParserError> {
        self.block_depth += 1;
        let mut statements = vec![];
        while !self.check(TokenType::RightBrace) && !self.is_at_end() {
            if let Some(statement) = self.declaration_or_recover() {
                statements.push(statement);
            }
        }
        self.block_depth -= 1;
        self.consume(TokenType::RightBrace, "'}' after block")?;
        Ok(statements)
    }

    fn expression(&mut self) -> Result<Expr, ParserError> {
        self.nested(Self::assignment)
    }

    /// Runs `parse` one level deeper. Every recursive rule goes through here or `unary`.
    fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T, ParserError>,
    ) -> Result<T, ParserError> {
        if self.nesting >= MAX_NESTING {
            return Err(self.nesting_error());
        }
        self.nesting += 1;
        let result = parse(self);
        self.nesting -= 1;
        result
    }

    fn nesting_error(&mut self) -> ParserError {
        self.error_at_current(&format!("at most {MAX_NESTING} levels of nesting"))
    }

    fn assignment(&mut self) -> Result<Expr, ParserError> {
        let expr = self.logic_or()?;

        if let Some(equals) = self.match_current(&[TokenType::Equal]) {
            // right-associative: `a = b = c` is `a = (b = c)`
            let value = Box::new(self.expression()?);
            return match expr {
                Expr::Variable { name, .. } => Ok(Expr::Assign { name, value }),
                Expr::GetAttr { object, name } => Ok(Expr::SetAttr {
                    object,
                    name,
                    value,
                }),
                _ => Err(ParserError::InvalidAssignmentTarget {
                    position: equals.position,
                }),
            };
        }

        Ok(expr)
    }

    fn logic_or(&mut self) -> Result<Expr, ParserError> {
        let mut expr = self.logic_and()?;
        while self.match_current(&[TokenType::Or]).is_some() {
            let right = self.logic_and()?;
            expr = Expr::BinaryLogical {
                operator: BinaryLogicalOperator::Or,
                left: Box::new(expr),
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn logic_and(&mut self) -> Result<Expr, ParserError> {
        let mut expr = self.equality()?;
        while self.match_current(&[TokenType::And]).is_some() {
            let right = self.equality()?;
            expr = Expr::BinaryLogical {
                operator: BinaryLogicalOperator::And,
                left: Box::new(expr),
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn equality(&mut self) -> Result<Expr, ParserError> {
        let mut expr = self.comparison()?;
        while let Some(operator) = self.match_binary_operator(&EQUALITY_OPERATORS) {
            let right = self.comparison()?;
            expr = Expr::Binary {
                operator,
                left: Box::new(expr),
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn comparison(&mut self) -> Result<Expr, ParserError> {
        let mut expr = self.term()?;
        while let Some(operator) = self.match_binary_operator(&COMPARISON_OPERATORS) {
            let right = self.term()?;
            expr = Expr::Binary {
                operator,
                left: Box::new(expr),
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn term(&mut self) -> Result<Expr, ParserError> {
        let mut expr = self.factor()?;
        while let Some(operator) = self.match_binary_operator(&TERM_OPERATORS) {
            let right = self.factor()?;
            expr = Expr::Binary {
                operator,
                left: Box::new(expr),
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn factor(&mut self) -> Result<Expr, ParserError> {
        let mut expr = self.unary()?;
        while let Some(operator) = self.match_binary_operator(&FACTOR_OPERATORS) {
            let right = self.unary()?;
            expr = Expr::Binary {
                operator,
                left: Box::new(expr),
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    /// Prefix operators are collected first, then applied innermost first: `!-a` is `!(-a)`.
    fn unary(&mut self) -> Result<Expr, ParserError> {
        let mut operators = vec![];
        loop {
            let operator = match self.peek_type() {
                TokenType::Bang => UnaryOperator::Not,
                TokenType::Minus => UnaryOperator::Minus,
                _ => break,
            };
            if self.nesting + operators.len() >= MAX_NESTING {
                return Err(self.nesting_error());
            }
            self.advance();
            operators.push(operator);
        }
        let operand = self.call()?;
        Ok(operators
            .into_iter()
            .rev()
            .fold(operand, |expression, operator| Expr::Unary {
                operator,
                expression: Box::new(expression),
            }))
    }

    /// A primary followed by any number of `(args)` and `.name` suffixes, folded left to right.
    fn call(&mut self) -> Result<Expr, ParserError> {
        let mut expr = self.primary()?;
        loop {
            if self.match_current(&[TokenType::LeftParen]).is_some() {
                expr = self.finish_call(expr)?;
            } else if self.match_current(&[TokenType::Dot]).is_some() {
                let name = self.consume(TokenType::Identifier, "property name after '.'")?;
                expr = Expr::GetAttr {
                    object: Box::new(expr),
                    name: name.lexeme,
                };
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn finish_call(&mut self, callee: Expr) -> Result<Expr, ParserError> {
        let mut arguments = vec![];
        if !self.check(TokenType::RightParen) {
            loop {
                arguments.push(self.expression()?);
                if self.match_current(&[TokenType::Comma]).is_none() {
                    break;
                }
            }
        }
        self.consume(TokenType::RightParen, "')' after arguments")?;
        Ok(Expr::Call {
            callee: Box::new(callee),
            arguments,
        })
    }

    fn primary(&mut self) -> Result<Expr, ParserError> {
        match self.peek_type() {
            TokenType::Number(number) => {
                self.advance();
                Ok(Expr::Literal(Literal::Number(number)))
            }
            TokenType::Bool(value) => {
                self.advance();
                Ok(Expr::Literal(Literal::Bool(value)))
            }
            TokenType::Nil => {
                self.advance();
                Ok(Expr::Literal(Literal::Nil))
            }
            TokenType::String => {
                let token = self.advance();
                let text = token
                    .lexeme
                    .strip_prefix('"')
                    .and_then(|s| s.strip_suffix('"'))
                    .unwrap_or(&token.lexeme);
                Ok(Expr::Literal(Literal::String(text.to_string())))
            }
            TokenType::Identifier => {
                let token = self.advance();
                Ok(Expr::Variable {
                    name: token.lexeme,
                    line: token.position.line,
                })
            }
            TokenType::This => {
                let token = self.advance();
                Ok(Expr::This {
                    line: token.position.line,
                })
            }
            TokenType::Super => {
                let keyword = self.advance();
                self.consume(TokenType::Dot, "'.' after 'super'")?;
                let method = self.consume(TokenType::Identifier, "superclass method name")?;
                Ok(Expr::Super {
                    method: method.lexeme,
                    line: keyword.position.line,
                })
            }
            TokenType::LeftParen => {
                self.advance();
                let expr = self.expression()?;
                self.consume(TokenType::RightParen, "')' after expression")?;
                Ok(Expr::Grouping(Box::new(expr)))
            }
            _ => Err(self.error_at_current("expression")),
        }
    }

    fn match_binary_operator(
        &mut self,
        operators: &[(TokenType, BinaryOperator)],
    ) -> Option<BinaryOperator> {
        let token_type = self.peek_type();
        let (_, operator) = operators.iter().find(|(t, _)| *t == token_type)?;
        self.advance();
        Some(*operator)
    }

    fn match_current(&mut self, token_types: &[TokenType]) -> Option<Token> {
        let token = self
            .tokens
            .next_if(|t| token_types.contains(&t.r#type))?;
        self.last_position = token.position;
        Some(token)
    }

    fn consume(&mut self, token_type: TokenType, expected: &str) -> Result<Token, ParserError> {
        match self.match_current(&[token_type]) {
            Some(token) => Ok(token),
            None => Err(self.error_at_current(expected)),
        }
    }

    /// Past the end of the stream this keeps returning EOF tokens.
    fn advance(&mut self) -> Token {
        match self.tokens.next() {
            Some(token) => {
                self.last_position = token.position;
                token
            }
            None => Token {
                r#type: TokenType::EOF,
                lexeme: "".to_string(),
                position: self.last_position,
            },
        }
    }

    fn peek_type(&mut self) -> TokenType {
        self.tokens
            .peek()
            .map(|t| t.r#type)
            .unwrap_or(TokenType::EOF)
    }

    fn check(&mut self, token_type: TokenType) -> bool {
        self.peek_type() == token_type
    }

    fn is_at_end(&mut self) -> bool {
        self.check(TokenType::EOF)
    }

    fn error_at_current(&mut self, expected: &str) -> ParserError {
        let (found, position) = match self.tokens.peek() {
            Some(token) if token.r#type != TokenType::EOF => {
                (format!("'{}'", token.lexeme), token.position)
            }
            Some(token) => ("end of input".to_string(), token.position),
            None => ("end of input".to_string(), self.last_position),
        };
        ParserError::UnexpectedToken {
            expected: expected.to_string(),
            found,
            position,
        }
    }
}
