use thiserror::Error;

use crate::parser::ParserError;
use crate::scanner::ScanningError;
use crate::token::Position;

/// Any error reported while turning source text into a syntax tree.
#[derive(Debug, Error, PartialEq, Clone)]
pub enum SyntaxError {
    #[error(transparent)]
    Scanning(#[from] ScanningError),
    #[error(transparent)]
    Parsing(#[from] ParserError),
}

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum ErrorKind {
    LexicalError,
    UnterminatedString,
    InvalidNumber,
    SyntaxError,
    InvalidAssignmentTarget,
}

impl SyntaxError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyntaxError::Scanning(ScanningError::UnexpectedCharacter { .. }) => {
                ErrorKind::LexicalError
            }
            SyntaxError::Scanning(ScanningError::UnterminatedString { .. }) => {
                ErrorKind::UnterminatedString
            }
            SyntaxError::Scanning(ScanningError::MalformedNumber { .. }) => {
                ErrorKind::InvalidNumber
            }
            SyntaxError::Parsing(ParserError::UnexpectedToken { .. }) => ErrorKind::SyntaxError,
            SyntaxError::Parsing(ParserError::InvalidAssignmentTarget { .. }) => {
                ErrorKind::InvalidAssignmentTarget
            }
        }
    }

    pub fn position(&self) -> Position {
        match self {
            SyntaxError::Scanning(error) => error.position(),
            SyntaxError::Parsing(error) => error.position(),
        }
    }
}
