//! Front-end for a small class-based scripting language in the Lox family:
//! a scanner turning source text into tokens, and a recursive descent parser
//! turning tokens into an owned syntax tree.
//!
//! ```
//! let program = loxparse::parse("print 1 + 2 * 3;").unwrap();
//! assert_eq!(program.to_string(), "(print (+ 1 (* 2 3)))");
//! ```

pub mod ast;
mod error;
pub mod parser;
pub mod resolver;
pub mod scanner;
pub mod token;

#[cfg(test)]
mod test_helpers;

pub use error::{ErrorKind, SyntaxError};

use crate::ast::Program;
use crate::parser::Parser;
use crate::scanner::tokenize;

/// Scan and parse `source`.
/// Lexical errors stop before parsing. Otherwise every syntax error found is returned, in source order.
pub fn parse(source: &str) -> Result<Program, Vec<SyntaxError>> {
    let tokens = tokenize(source).map_err(|errors| {
        errors
            .into_iter()
            .map(SyntaxError::from)
            .collect::<Vec<SyntaxError>>()
    })?;
    let mut parser = Parser::new(tokens.into_iter());
    parser
        .parse_program()
        .map_err(|errors| errors.into_iter().map(SyntaxError::from).collect())
}
