use std::iter::Peekable;
use std::str::Chars;

use log::debug;
use thiserror::Error;

use crate::token::{Position, Token, TokenType};

/// public interface for tokenizing.
/// Scanning never stops at the first error: every lexical error in `source` is collected.
pub fn tokenize(source: &str) -> Result<Vec<Token>, Vec<ScanningError>> {
    let mut scanner = Scanner::new(source);
    scanner.scan_tokens();
    debug!(
        "scanned {} tokens with {} errors",
        scanner.tokens.len(),
        scanner.errors.len()
    );
    if scanner.errors.is_empty() {
        Ok(scanner.tokens)
    } else {
        Err(scanner.errors)
    }
}

struct Scanner<'a> {
    source: &'a str,
    char_iter: Peekable<Chars<'a>>,
    tokens: Vec<Token>,
    errors: Vec<ScanningError>,

    // byte offset of the start of lexeme
    current_lexeme_start: usize,
    lexeme_position: Position,
    current: usize,
    line: usize,
    column: usize,
}

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ScanningError {
    #[error("Unexpected character '{character}'.")]
    UnexpectedCharacter {
        position: Position,
        character: char,
    },
    #[error("Unterminated string.")]
    UnterminatedString {
        position: Position,
        string_start: String,
    },
    #[error("Invalid number '{lexeme}': leading zeros are not allowed.")]
    MalformedNumber { position: Position, lexeme: String },
}

impl ScanningError {
    pub fn position(&self) -> Position {
        match self {
            ScanningError::UnexpectedCharacter { position, .. }
            | ScanningError::UnterminatedString { position, .. }
            | ScanningError::MalformedNumber { position, .. } => *position,
        }
    }
}

impl Scanner<'_> {
    fn new(source: &str) -> Scanner<'_> {
        Scanner {
            source,
            char_iter: source.chars().peekable(),
            tokens: vec![],
            errors: vec![],
            current_lexeme_start: 0,
            lexeme_position: Position::new(1, 1),
            current: 0,
            line: 1,
            column: 1,
        }
    }

    fn scan_tokens(&mut self) {
        while !self.is_at_end() {
            if let Err(scanning_error) = self.scan_token() {
                debug!("{scanning_error} at {}", scanning_error.position());
                self.errors.push(scanning_error);
            }
        }
        self.tokens.push(Token {
            r#type: TokenType::EOF,
            lexeme: "".to_string(),
            position: self.position(),
        });
    }

    fn scan_token(&mut self) -> Result<(), ScanningError> {
        // set start of lexeme
        self.current_lexeme_start = self.current;
        self.lexeme_position = self.position();
        let Some(c) = self.advance() else {
            return Ok(());
        };
        let maybe_token_type = match c {
            '(' => Some(TokenType::LeftParen),
            ')' => Some(TokenType::RightParen),
            '{' => Some(TokenType::LeftBrace),
            '}' => Some(TokenType::RightBrace),
            ',' => Some(TokenType::Comma),
            '.' => Some(TokenType::Dot),
            '-' => Some(TokenType::Minus),
            '+' => Some(TokenType::Plus),
            ';' => Some(TokenType::Semicolon),
            '*' => Some(TokenType::Star),
            '!' => match self.match_one('=') {
                true => Some(TokenType::BangEqual),
                false => Some(TokenType::Bang),
            },
            '=' => match self.match_one('=') {
                true => Some(TokenType::EqualEqual),
                false => Some(TokenType::Equal),
            },
            '<' => match self.match_one('=') {
                true => Some(TokenType::LessEqual),
                false => Some(TokenType::Less),
            },
            '>' => match self.match_one('=') {
                true => Some(TokenType::GreaterEqual),
                false => Some(TokenType::Greater),
            },
            '/' => {
                if self.match_one('/') {
                    while self.peek_one().is_some_and(|c| *c != '\n') {
                        self.advance();
                    }
                    None
                } else {
                    Some(TokenType::Slash)
                }
            }
            c if c.is_whitespace() => None,
            '"' => Some(self.consume_if_match_string()?),
            c if is_digit(&c) => Some(self.consume_if_match_number()?),
            c if is_alpha(&c) => Some(self.consume_if_match_identifier()),
            _ => {
                return Err(ScanningError::UnexpectedCharacter {
                    position: self.lexeme_position,
                    character: c,
                });
            }
        };

        if let Some(token_type) = maybe_token_type {
            self.add_token(token_type);
        }
        Ok(())
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }

    fn position(&self) -> Position {
        Position::new(self.line, self.column)
    }

    fn match_one(&mut self, expected: char) -> bool {
        if self.peek_one() != Some(&expected) {
            return false;
        }
        self.advance();
        true
    }

    fn advance(&mut self) -> Option<char> {
        let current_char = self.char_iter.next()?;
        self.current += current_char.len_utf8();
        if current_char == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(current_char)
    }

    fn add_token(&mut self, token_type: TokenType) {
        // `current` only ever moves by whole characters so both ends are char boundaries.
        let text: String = self.source[self.current_lexeme_start..self.current].to_string();
        self.tokens.push(Token {
            r#type: token_type,
            lexeme: text,
            position: self.lexeme_position,
        });
    }

    /// like advance but does not consume the character. 1 lookahead.
    fn peek_one(&mut self) -> Option<&char> {
        self.char_iter.peek()
    }

    /// 2 lookahead
    fn peek_two(&self) -> Option<char> {
        self.source[self.current..].chars().nth(1)
    }

    /// Strings end on the same line they start on. There are no escape sequences.
    fn consume_if_match_string(&mut self) -> Result<TokenType, ScanningError> {
        while self.peek_one().is_some_and(|c| *c != '"' && *c != '\n') {
            self.advance();
        }

        if self.peek_one() != Some(&'"') {
            // the newline is left alone so scanning resumes on the next line.
            return Err(ScanningError::UnterminatedString {
                position: self.lexeme_position,
                string_start: self.source[self.current_lexeme_start..self.current].to_string(),
            });
        }

        // consume closing quote
        self.advance();

        Ok(TokenType::String)
    }

    fn consume_if_match_number(&mut self) -> Result<TokenType, ScanningError> {
        while self.peek_one().is_some_and(is_digit) {
            self.advance();
        }
        let integer_part_end = self.current;

        if self.peek_one() == Some(&'.') && self.peek_two().is_some_and(|c| is_digit(&c)) {
            // consume the '.'
            self.advance();
            while self.peek_one().is_some_and(is_digit) {
                self.advance();
            }
        }

        let lexeme = &self.source[self.current_lexeme_start..self.current];
        let integer_part = &self.source[self.current_lexeme_start..integer_part_end];
        let malformed = || ScanningError::MalformedNumber {
            position: self.lexeme_position,
            lexeme: lexeme.to_string(),
        };
        // `0` is fine, `007` is not.
        if integer_part.len() > 1 && integer_part.starts_with('0') {
            return Err(malformed());
        }

        lexeme
            .parse::<f64>()
            .map(TokenType::Number)
            .map_err(|_| malformed())
    }

    fn consume_if_match_identifier(&mut self) -> TokenType {
        while self.peek_one().is_some_and(is_alphanumeric) {
            self.advance();
        }

        let lexeme = &self.source[self.current_lexeme_start..self.current];

        match_keyword(lexeme).unwrap_or(TokenType::Identifier)
    }
}

fn match_keyword(input: &str) -> Option<TokenType> {
    match input {
        "and" => Some(TokenType::And),
        "class" => Some(TokenType::Class),
        "else" => Some(TokenType::Else),
        "false" => Some(TokenType::Bool(false)),
        "fun" => Some(TokenType::Fun),
        "for" => Some(TokenType::For),
        "if" => Some(TokenType::If),
        "nil" => Some(TokenType::Nil),
        "or" => Some(TokenType::Or),
        "print" => Some(TokenType::Print),
        "return" => Some(TokenType::Return),
        "super" => Some(TokenType::Super),
        "this" => Some(TokenType::This),
        "true" => Some(TokenType::Bool(true)),
        "var" => Some(TokenType::Var),
        "while" => Some(TokenType::While),
        _ => None,
    }
}

fn is_digit(c: &char) -> bool {
    c.is_ascii_digit()
}
fn is_alpha(c: &char) -> bool {
    matches!(c, 'a'..='z' | 'A'..='Z' | '_')
}
fn is_alphanumeric(c: &char) -> bool {
    is_digit(c) || is_alpha(c)
}

#[cfg(test)]
mod tests {
    use crate::scanner::{tokenize, Scanner, ScanningError};
    use crate::token::{Position, Token, TokenType};

    fn token(r#type: TokenType, lexeme: &str, line: usize, column: usize) -> Token {
        Token {
            r#type,
            lexeme: lexeme.to_string(),
            position: Position::new(line, column),
        }
    }

    fn types(source: &str) -> Vec<TokenType> {
        tokenize(source)
            .expect("error in test setup")
            .into_iter()
            .map(|t| t.r#type)
            .collect()
    }

    #[test]
    fn test_scanning_regular_tokens() {
        let mut scanner = Scanner::new("{,.}");
        scanner.scan_tokens();
        assert_eq!(
            scanner.tokens,
            vec![
                token(TokenType::LeftBrace, "{", 1, 1),
                token(TokenType::Comma, ",", 1, 2),
                token(TokenType::Dot, ".", 1, 3),
                token(TokenType::RightBrace, "}", 1, 4),
                token(TokenType::EOF, "", 1, 5),
            ]
        )
    }

    #[test]
    fn test_scanning_multiple_character_operator() {
        assert_eq!(
            types(">= <= == != ! = < >"),
            vec![
                TokenType::GreaterEqual,
                TokenType::LessEqual,
                TokenType::EqualEqual,
                TokenType::BangEqual,
                TokenType::Bang,
                TokenType::Equal,
                TokenType::Less,
                TokenType::Greater,
                TokenType::EOF,
            ]
        )
    }

    #[test]
    fn test_scanner_handles_strings() {
        let tokens = tokenize("\"hello\"").unwrap();
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0], token(TokenType::String, "\"hello\"", 1, 1));
    }

    #[test]
    fn test_string_does_not_span_lines() {
        let errors = tokenize("var a = \"a string \n print a;").unwrap_err();
        assert_eq!(
            errors,
            vec![ScanningError::UnterminatedString {
                position: Position::new(1, 9),
                string_start: "\"a string ".to_string(),
            }]
        );
    }

    #[test]
    fn test_unterminated_string_at_end_of_input() {
        let errors = tokenize("print \"oops").unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            errors[0],
            ScanningError::UnterminatedString { .. }
        ));
    }

    #[test]
    fn test_scanner_handles_numbers() {
        let tokens = tokenize("1.2").unwrap();
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0], token(TokenType::Number(1.2), "1.2", 1, 1));
    }

    #[test]
    fn test_scanner_handles_numbers_2() {
        let tokens = tokenize("1.some").unwrap();
        assert_eq!(tokens.len(), 4);
        assert_eq!(tokens[0], token(TokenType::Number(1.), "1", 1, 1));
        assert_eq!(tokens[1], token(TokenType::Dot, ".", 1, 2));
        assert_eq!(tokens[2], token(TokenType::Identifier, "some", 1, 3));
    }

    #[test]
    fn test_zero_and_fraction_accepted() {
        assert_eq!(types("0"), vec![TokenType::Number(0.), TokenType::EOF]);
        assert_eq!(types("0.5"), vec![TokenType::Number(0.5), TokenType::EOF]);
        assert_eq!(types("10"), vec![TokenType::Number(10.), TokenType::EOF]);
    }

    #[test]
    fn test_leading_zero_rejected_as_one_error() {
        let errors = tokenize("007").unwrap_err();
        assert_eq!(
            errors,
            vec![ScanningError::MalformedNumber {
                position: Position::new(1, 1),
                lexeme: "007".to_string(),
            }]
        );

        let errors = tokenize("00.5").unwrap_err();
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_true_and_false_carry_their_value() {
        assert_eq!(
            types("true false nil"),
            vec![
                TokenType::Bool(true),
                TokenType::Bool(false),
                TokenType::Nil,
                TokenType::EOF
            ]
        );
    }

    #[test]
    fn test_keywords_override_identifiers() {
        assert_eq!(
            types("class classy this super fun var"),
            vec![
                TokenType::Class,
                TokenType::Identifier,
                TokenType::This,
                TokenType::Super,
                TokenType::Fun,
                TokenType::Var,
                TokenType::EOF
            ]
        );
    }

    #[test]
    fn test_comments_are_discarded() {
        let tokens = tokenize("// 🤩 this is all a _façade_\nprint 1; // trailing").unwrap();
        assert_eq!(
            tokens.iter().map(|t| t.r#type).collect::<Vec<_>>(),
            vec![
                TokenType::Print,
                TokenType::Number(1.),
                TokenType::Semicolon,
                TokenType::EOF
            ]
        );
        assert_eq!(tokens[0].position, Position::new(2, 1));
    }

    #[test]
    fn test_identifier_with_digit() {
        let tokens = tokenize("a_0").unwrap();
        assert_eq!(tokens[0], token(TokenType::Identifier, "a_0", 1, 1));
        assert_eq!(tokens[1], token(TokenType::EOF, "", 1, 4));
    }

    #[test]
    fn test_unexpected_characters_are_all_reported() {
        let errors = tokenize("var a = 1 # 2;\n@").unwrap_err();
        assert_eq!(
            errors,
            vec![
                ScanningError::UnexpectedCharacter {
                    position: Position::new(1, 11),
                    character: '#',
                },
                ScanningError::UnexpectedCharacter {
                    position: Position::new(2, 1),
                    character: '@',
                },
            ]
        );
    }

    #[test]
    fn test_positions_track_lines_and_columns() {
        let tokens = tokenize("var x;\n  x = \"é\" + y;").unwrap();
        let y = tokens
            .iter()
            .find(|t| t.lexeme == "y")
            .expect("y should be scanned");
        // columns count characters, not bytes
        assert_eq!(y.position, Position::new(2, 13));
    }

    #[test]
    fn test_non_ascii_letters_are_unexpected_outside_strings() {
        let errors = tokenize("var café = 1;").unwrap_err();
        assert_eq!(
            errors,
            vec![ScanningError::UnexpectedCharacter {
                position: Position::new(1, 8),
                character: 'é',
            }]
        );
        // fine inside a string or a comment
        assert!(tokenize("print \"café\"; // é").is_ok());
    }

    #[test]
    fn test_unicode_whitespace_is_discarded() {
        let tokens = tokenize("print\u{00A0}1;\u{2003}").unwrap();
        assert_eq!(
            tokens,
            vec![
                token(TokenType::Print, "print", 1, 1),
                token(TokenType::Number(1.), "1", 1, 7),
                token(TokenType::Semicolon, ";", 1, 8),
                token(TokenType::EOF, "", 1, 10),
            ]
        );
    }
}
