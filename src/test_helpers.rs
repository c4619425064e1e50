use crate::ast::{Expr, Program, Statement};
use crate::parser::{Parser, ParserError};
use crate::resolver::{Resolver, ResolverError};
use crate::scanner::tokenize;

// Scanning errors are test setup mistakes here, hence the panics.

pub fn parse_expr(code: &str) -> Result<Expr, ParserError> {
    let tokens = tokenize(code).unwrap_or_else(|errors| panic!("{errors:?}"));
    let mut parser = Parser::new(tokens.into_iter());
    parser.parse_expression()
}

pub fn parse_statement(code: &str) -> Result<Statement, ParserError> {
    let tokens = tokenize(code).unwrap_or_else(|errors| panic!("{errors:?}"));
    let mut parser = Parser::new(tokens.into_iter());
    parser.parse_statement()
}

pub fn parse_program(code: &str) -> Result<Program, Vec<ParserError>> {
    let tokens = tokenize(code).unwrap_or_else(|errors| panic!("{errors:?}"));
    let mut parser = Parser::new(tokens.into_iter());
    parser.parse_program()
}

pub fn parse_and_resolve_program(code: &str) -> Result<Program, ResolverError> {
    let program = parse_program(code).expect("error in test setup");
    Resolver::new().resolve_program(&program)?;
    Ok(program)
}
