use std::fmt;

use thiserror::Error;

use crate::ast::{MathOperator, Token};

/// Location of a character in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    /// Byte offset from the start of the input
    pub offset: usize,
    /// 1-based line number
    pub line: usize,
    /// 1-based column, counted in characters
    pub column: usize,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {} (offset {})", self.line, self.column, self.offset)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LexError {
    #[error("Unterminated string starting at {position}")]
    UnterminatedString { position: Position },
    #[error("Invalid escape sequence '\\{ch}' at {position}")]
    InvalidEscape { ch: char, position: Position },
    #[error("Unexpected character '{ch}' at {position}")]
    UnexpectedChar { ch: char, position: Position },
    #[error("Invalid number '{text}' at {position}")]
    InvalidNumber { text: String, position: Position },
}

impl LexError {
    pub fn position(&self) -> Position {
        match self {
            LexError::UnterminatedString { position }
            | LexError::InvalidEscape { position, .. }
            | LexError::UnexpectedChar { position, .. }
            | LexError::InvalidNumber { position, .. } => *position,
        }
    }
}

pub struct Lexer {
    input: Vec<char>,
    position: usize,
    offset: usize,
    line: usize,
    column: usize,
    token_start: Position,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Lexer {
            input: input.chars().collect(),
            position: 0,
            offset: 0,
            line: 1,
            column: 1,
            token_start: Position {
                offset: 0,
                line: 1,
                column: 1,
            },
        }
    }

    /// Position of the first character of the most recently returned token.
    pub fn token_start(&self) -> Position {
        self.token_start
    }

    fn here(&self) -> Position {
        Position {
            offset: self.offset,
            line: self.line,
            column: self.column,
        }
    }

    fn current_char(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek_char(&self, offset: usize) -> Option<char> {
        self.input.get(self.position + offset).copied()
    }

    fn advance(&mut self) {
        if let Some(ch) = self.current_char() {
            self.offset += ch.len_utf8();
            if ch == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
            self.position += 1;
        }
    }

    /// Skips whitespace and `#` comments.
    fn skip_trivia(&mut self) {
        while let Some(ch) = self.current_char() {
            if ch.is_whitespace() {
                self.advance();
            } else if ch == '#' {
                while let Some(c) = self.current_char() {
                    if c == '\n' {
                        break;
                    }
                    self.advance();
                }
            } else {
                break;
            }
        }
    }

    fn is_word_char(ch: char) -> bool {
        ch.is_alphanumeric() || ch == '_'
    }

    /// Tries the operator table in order and returns the first spelling that
    /// matches at the current position, with its length in characters.
    ///
    /// A space in a spelling matches any run of whitespace, and word
    /// spellings must end on a word boundary.
    fn match_operator(&self) -> Option<(MathOperator, usize)> {
        'table: for (spelling, op) in MathOperator::TABLE {
            let mut consumed = 0;
            for expected in spelling.chars() {
                if expected == ' ' {
                    let mut gap = 0;
                    while self
                        .peek_char(consumed + gap)
                        .is_some_and(|c| c.is_whitespace())
                    {
                        gap += 1;
                    }
                    if gap == 0 {
                        continue 'table;
                    }
                    consumed += gap;
                } else if self.peek_char(consumed) == Some(expected) {
                    consumed += 1;
                } else {
                    continue 'table;
                }
            }
            let is_word = spelling.chars().all(|c| c.is_alphabetic() || c == ' ');
            if is_word && self.peek_char(consumed).is_some_and(Self::is_word_char) {
                continue;
            }
            return Some((*op, consumed));
        }
        None
    }

    fn read_word(&mut self) -> String {
        let mut result = String::new();
        while let Some(ch) = self.current_char() {
            if Self::is_word_char(ch) {
                result.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        result
    }

    /// Identifier with at most one dotted segment (`table.column`).
    fn read_identifier(&mut self) -> String {
        let mut result = self.read_word();
        if self.current_char() == Some('.')
            && self
                .peek_char(1)
                .is_some_and(|c| c.is_alphabetic() || c == '_')
        {
            self.advance();
            result.push('.');
            result.push_str(&self.read_word());
        }
        result
    }

    fn read_string(&mut self, quote: char) -> Result<String, LexError> {
        let start = self.here();
        let mut result = String::new();
        self.advance(); // Consume opening quote

        while let Some(ch) = self.current_char() {
            match ch {
                c if c == quote => {
                    self.advance();
                    return Ok(result);
                }
                '\\' => {
                    let escape_at = self.here();
                    self.advance(); // Consume backslash
                    match self.current_char() {
                        Some('n') => result.push('\n'),
                        Some('t') => result.push('\t'),
                        Some('r') => result.push('\r'),
                        Some('"') => result.push('"'),
                        Some('\'') => result.push('\''),
                        Some('\\') => result.push('\\'),
                        Some(ch) => {
                            return Err(LexError::InvalidEscape {
                                ch,
                                position: escape_at,
                            });
                        }
                        None => return Err(LexError::UnterminatedString { position: start }),
                    }
                    self.advance();
                }
                _ => {
                    result.push(ch);
                    self.advance();
                }
            }
        }

        Err(LexError::UnterminatedString { position: start })
    }

    fn read_number(&mut self) -> Result<Token, LexError> {
        let start = self.here();
        let mut number = String::new();
        let mut is_float = false;

        while let Some(ch) = self.current_char() {
            if ch.is_ascii_digit() {
                number.push(ch);
                self.advance();
            } else if ch == '.'
                && !is_float
                && self.peek_char(1).is_some_and(|c| c.is_ascii_digit())
            {
                is_float = true;
                number.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        // Exponent, only when digits follow
        if matches!(self.current_char(), Some('e') | Some('E')) {
            let signed = matches!(self.peek_char(1), Some('+') | Some('-'));
            let digit_at = if signed { 2 } else { 1 };
            if self.peek_char(digit_at).is_some_and(|c| c.is_ascii_digit()) {
                is_float = true;
                for _ in 0..digit_at {
                    if let Some(c) = self.current_char() {
                        number.push(c);
                    }
                    self.advance();
                }
                while let Some(c) = self.current_char().filter(char::is_ascii_digit) {
                    number.push(c);
                    self.advance();
                }
            }
        }

        if self.current_char().is_some_and(|c| c.is_alphabetic() || c == '_') {
            number.push_str(&self.read_word());
            return Err(LexError::InvalidNumber {
                text: number,
                position: start,
            });
        }

        let invalid = |number: String| LexError::InvalidNumber {
            text: number,
            position: start,
        };
        if is_float {
            match number.parse::<f64>() {
                Ok(value) if value.is_finite() => Ok(Token::Float(value)),
                _ => Err(invalid(number)),
            }
        } else {
            number
                .parse::<i64>()
                .map(Token::Integer)
                .map_err(|_| invalid(number))
        }
    }

    fn single(&mut self, token: Token) -> Result<Token, LexError> {
        self.advance();
        Ok(token)
    }

    pub fn next_token(&mut self) -> Result<Token, LexError> {
        self.skip_trivia();
        self.token_start = self.here();

        if let Some((op, len)) = self.match_operator() {
            for _ in 0..len {
                self.advance();
            }
            return Ok(Token::Operator(op));
        }

        match self.current_char() {
            None => Ok(Token::Eof),
            Some(';') => self.single(Token::Semicolon),
            Some('|') => self.single(Token::Pipe),
            Some('-') => self.single(Token::Minus),
            Some('&') => self.single(Token::Ampersand),
            Some('(') => self.single(Token::LParen),
            Some(')') => self.single(Token::RParen),
            Some('[') => self.single(Token::LBracket),
            Some(']') => self.single(Token::RBracket),
            Some(',') => self.single(Token::Comma),
            Some('.') => self.single(Token::Dot),
            Some('"') => self.read_string('"').map(Token::String),
            Some('\'') => self.read_string('\'').map(Token::String),
            Some(ch) if ch.is_alphabetic() || ch == '_' => {
                let ident = self.read_identifier();
                Ok(Token::keyword(&ident).unwrap_or(Token::Identifier(ident)))
            }
            Some(ch) if ch.is_ascii_digit() => self.read_number(),
            Some(ch) => Err(LexError::UnexpectedChar {
                ch,
                position: self.here(),
            }),
        }
    }

    /// Drains the lexer into a token vector ending with [`Token::Eof`].
    pub fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = vec![];
        loop {
            let token = self.next_token()?;
            let done = token == Token::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }
}

#[test]
fn test_keywords() {
    let mut lexer = Lexer::new("SELECT FROM WHERE AND OR NULL true false");
    assert_eq!(lexer.next_token().unwrap(), Token::Select);
    assert_eq!(lexer.next_token().unwrap(), Token::From);
    assert_eq!(lexer.next_token().unwrap(), Token::Where);
    assert_eq!(lexer.next_token().unwrap(), Token::And);
    assert_eq!(lexer.next_token().unwrap(), Token::Or);
    assert_eq!(lexer.next_token().unwrap(), Token::Null);
    assert_eq!(lexer.next_token().unwrap(), Token::Boolean(true));
    assert_eq!(lexer.next_token().unwrap(), Token::Boolean(false));
}

#[test]
fn test_term() {
    let mut lexer = Lexer::new("score >= 10;");
    assert_eq!(
        lexer.next_token().unwrap(),
        Token::Identifier("score".to_string())
    );
    assert_eq!(
        lexer.next_token().unwrap(),
        Token::Operator(MathOperator::GreaterEqual)
    );
    assert_eq!(lexer.next_token().unwrap(), Token::Integer(10));
    assert_eq!(lexer.next_token().unwrap(), Token::Semicolon);
    assert_eq!(lexer.next_token().unwrap(), Token::Eof);
}

#[test]
fn test_token_start_tracks_lines() {
    let mut lexer = Lexer::new("COUNT\n  FROM x");
    lexer.next_token().unwrap();
    lexer.next_token().unwrap();
    let start = lexer.token_start();
    assert_eq!(start.line, 2);
    assert_eq!(start.column, 3);
    assert_eq!(start.offset, 8);
}
