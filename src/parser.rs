use std::mem;

use thiserror::Error;

use crate::{
    ast::{
        Command, FieldIdentifier, FilterExpression, FilterOperand, FilterTerm, GroupBy, Having,
        HavingOperator, Model, SetExpression, SetOperand, SetOperator, Token, BoolOperator,
    },
    lexer::{LexError, Lexer, Position},
    value::Value,
};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error("Expected {expected}, got {found} at {position}")]
    UnexpectedToken {
        expected: String,
        found: String,
        position: Position,
    },
}

impl ParseError {
    pub fn position(&self) -> Option<Position> {
        match self {
            ParseError::Lex(e) => Some(e.position()),
            ParseError::UnexpectedToken { position, .. } => Some(*position),
        }
    }
}

type ParseResult<T> = Result<T, ParseError>;

/// Parses a whole batch of `;`-separated commands.
///
/// # Examples
///
/// ```
/// use vql_lang::parse;
///
/// let model = parse("CREATE a FROM s WHERE score >= 10; COUNT FROM a;").unwrap();
/// assert_eq!(model.commands.len(), 2);
/// ```
pub fn parse(text: &str) -> Result<Model, ParseError> {
    Parser::new(Lexer::new(text))?.parse_model()
}

pub struct Parser {
    lexer: Lexer,
    current_token: Token,
    current_position: Position,
}

impl Parser {
    pub fn new(mut lexer: Lexer) -> ParseResult<Self> {
        let current_token = lexer.next_token()?;
        let current_position = lexer.token_start();
        Ok(Parser {
            lexer,
            current_token,
            current_position,
        })
    }

    fn advance(&mut self) -> ParseResult<()> {
        self.current_token = self.lexer.next_token()?;
        self.current_position = self.lexer.token_start();
        Ok(())
    }

    fn error<T>(&self, expected: &str) -> ParseResult<T> {
        Err(ParseError::UnexpectedToken {
            expected: expected.to_string(),
            found: self.current_token.describe(),
            position: self.current_position,
        })
    }

    fn expect(&mut self, expected: Token) -> ParseResult<()> {
        if !self.check(&expected) {
            return self.error(&expected.describe());
        }
        self.advance()
    }

    fn check(&self, token: &Token) -> bool {
        mem::discriminant(&self.current_token) == mem::discriminant(token)
    }

    fn expect_identifier(&mut self, what: &str) -> ParseResult<String> {
        match mem::replace(&mut self.current_token, Token::Eof) {
            Token::Identifier(name) => {
                self.advance()?;
                Ok(name)
            }
            other => {
                self.current_token = other;
                self.error(what)
            }
        }
    }

    fn expect_string(&mut self, what: &str) -> ParseResult<String> {
        match mem::replace(&mut self.current_token, Token::Eof) {
            Token::String(s) => {
                self.advance()?;
                Ok(s)
            }
            other => {
                self.current_token = other;
                self.error(what)
            }
        }
    }

    /// Parse a complete batch
    pub fn parse_model(&mut self) -> ParseResult<Model> {
        let mut commands = vec![];

        loop {
            while self.check(&Token::Semicolon) {
                self.advance()?;
            }
            if self.check(&Token::Eof) {
                break;
            }

            commands.push(self.parse_command()?);

            if self.check(&Token::Semicolon) {
                self.advance()?;
            } else if !self.check(&Token::Eof) {
                return self.error("';'");
            }
        }

        Ok(Model { commands })
    }

    pub fn parse_command(&mut self) -> ParseResult<Command> {
        match &self.current_token {
            Token::Select => self.parse_select(),
            Token::Create => self.parse_create(),
            Token::Count => self.parse_count(),
            Token::Drop => self.parse_drop(),
            Token::Show => self.parse_show(),
            Token::Import => self.parse_import(),
            _ => self.error("a command (SELECT, CREATE, COUNT, DROP, SHOW or IMPORT)"),
        }
    }

    fn parse_select(&mut self) -> ParseResult<Command> {
        self.advance()?; // consume SELECT
        let fields = self.parse_field_list()?;

        let source = if self.check(&Token::From) {
            self.advance()?;
            Some(self.expect_identifier("a set name")?)
        } else {
            None
        };

        let filter = self.parse_where()?;
        let group_by = self.parse_group_by()?;

        Ok(Command::Select {
            fields,
            source,
            filter,
            group_by,
        })
    }

    fn parse_create(&mut self) -> ParseResult<Command> {
        self.advance()?; // consume CREATE
        let target = self.expect_identifier("a target set name")?;

        if self.current_token == Token::Operator(crate::ast::MathOperator::Equal) {
            self.advance()?;
            let expression = self.parse_set_expression()?;
            return Ok(Self::set_command(target, expression));
        }

        self.expect(Token::From)?;
        let source = self.expect_identifier("a source set name")?;

        if self.check(&Token::Intersect) {
            self.advance()?;
            let path = self.expect_string("a quoted file path")?;
            return Ok(Command::CreateIntersect {
                target,
                source,
                path,
            });
        }

        let filter = self.parse_where()?;
        let group_by = self.parse_group_by()?;

        Ok(Command::Create {
            target,
            source,
            filter,
            group_by,
        })
    }

    /// `a op b` becomes the binary form, everything else the full expression.
    fn set_command(target: String, expression: SetExpression) -> Command {
        if let SetOperand::Name(first) = &expression.first
            && let [(op, SetOperand::Name(second))] = expression.rest.as_slice()
        {
            return Command::CreateSetOperation {
                target,
                first: first.clone(),
                op: *op,
                second: second.clone(),
            };
        }
        Command::CreateSetExpression { target, expression }
    }

    fn parse_count(&mut self) -> ParseResult<Command> {
        self.advance()?; // consume COUNT
        self.expect(Token::From)?;
        let source = self.expect_identifier("a set name")?;
        let filters = self.parse_where()?;
        Ok(Command::Count { source, filters })
    }

    fn parse_drop(&mut self) -> ParseResult<Command> {
        self.advance()?; // consume DROP
        let feature = self.expect_identifier("a feature kind")?;
        let name = self.expect_identifier("a name")?;
        Ok(Command::Drop { feature, name })
    }

    fn parse_show(&mut self) -> ParseResult<Command> {
        self.advance()?; // consume SHOW
        let feature = self.expect_identifier("a feature kind or set name")?;
        let name = if matches!(self.current_token, Token::Identifier(_)) {
            Some(self.expect_identifier("a name")?)
        } else {
            None
        };
        Ok(Command::Show { feature, name })
    }

    fn parse_import(&mut self) -> ParseResult<Command> {
        self.advance()?; // consume IMPORT
        let feature = self.expect_identifier("a feature kind")?;
        let path = self.expect_string("a quoted file path")?;
        let name = if self.check(&Token::As) {
            self.advance()?;
            Some(self.expect_identifier("a name")?)
        } else {
            None
        };
        Ok(Command::Import {
            feature,
            path,
            name,
        })
    }

    fn parse_where(&mut self) -> ParseResult<Option<FilterExpression>> {
        if !self.check(&Token::Where) {
            return Ok(None);
        }
        self.advance()?;
        self.parse_filter_expression().map(Some)
    }

    fn parse_group_by(&mut self) -> ParseResult<Option<GroupBy>> {
        if !self.check(&Token::Group) {
            return Ok(None);
        }
        self.advance()?;
        self.expect(Token::By)?;
        let fields = self.parse_field_list()?;

        let having = if self.check(&Token::Having) {
            self.advance()?;
            Some(self.parse_having()?)
        } else {
            None
        };

        Ok(Some(GroupBy { fields, having }))
    }

    fn parse_having(&mut self) -> ParseResult<Having> {
        if self.current_token != Token::Identifier("count".to_string()) {
            return self.error("'count'");
        }
        self.advance()?;

        let op = match &self.current_token {
            Token::Operator(op) => match HavingOperator::from_math(*op) {
                Some(op) => op,
                None => return self.error("a comparison operator (=, !=, >, <, >=, <=)"),
            },
            _ => return self.error("a comparison operator (=, !=, >, <, >=, <=)"),
        };
        self.advance()?;

        let negative = self.check(&Token::Minus);
        if negative {
            self.advance()?;
        }
        let value = match self.current_token {
            Token::Integer(n) => {
                if negative {
                    -n
                } else {
                    n
                }
            }
            _ => return self.error("an integer"),
        };
        self.advance()?;

        Ok(Having { op, value })
    }

    fn parse_field_list(&mut self) -> ParseResult<Vec<FieldIdentifier>> {
        let mut fields = vec![self.parse_field_identifier()?];
        while self.check(&Token::Comma) {
            self.advance()?;
            fields.push(self.parse_field_identifier()?);
        }
        Ok(fields)
    }

    /// `name`, `table.column` or `name['arg']` with an optional `.extra`
    pub fn parse_field_identifier(&mut self) -> ParseResult<FieldIdentifier> {
        let name = self.expect_identifier("a field")?;

        if !self.check(&Token::LBracket) {
            return Ok(FieldIdentifier::Field(name));
        }

        self.advance()?; // consume '['
        let arg = self.expect_string("a quoted function argument")?;
        self.expect(Token::RBracket)?;

        let extra = if self.check(&Token::Dot) {
            self.advance()?;
            Some(self.expect_identifier("an accessor after '.'")?)
        } else {
            None
        };

        Ok(FieldIdentifier::Function { name, arg, extra })
    }

    pub fn parse_filter_expression(&mut self) -> ParseResult<FilterExpression> {
        let first = self.parse_filter_operand()?;
        let mut rest = vec![];

        loop {
            let op = match &self.current_token {
                Token::And => BoolOperator::And,
                Token::Or => BoolOperator::Or,
                _ => break,
            };
            self.advance()?;
            rest.push((op, self.parse_filter_operand()?));
        }

        Ok(FilterExpression { first, rest })
    }

    fn parse_filter_operand(&mut self) -> ParseResult<FilterOperand> {
        if self.check(&Token::LParen) {
            self.advance()?;
            let expr = self.parse_filter_expression()?;
            self.expect(Token::RParen)?;
            return Ok(FilterOperand::Group(Box::new(expr)));
        }
        Ok(FilterOperand::Term(self.parse_filter_term()?))
    }

    fn parse_filter_term(&mut self) -> ParseResult<FilterTerm> {
        let field = self.parse_field_identifier()?;
        let op = match &self.current_token {
            Token::Operator(op) => *op,
            _ => return self.error("a comparison operator"),
        };
        self.advance()?;
        let value = self.parse_value()?;
        Ok(FilterTerm { field, op, value })
    }

    /// Literal on the right-hand side of a filter term
    pub fn parse_value(&mut self) -> ParseResult<Value> {
        match mem::replace(&mut self.current_token, Token::Eof) {
            Token::Integer(n) => {
                self.advance()?;
                Ok(Value::Integer(n))
            }
            Token::Float(n) => {
                self.advance()?;
                Ok(Value::Float(n))
            }
            Token::String(s) => {
                self.advance()?;
                Ok(Value::String(s))
            }
            Token::Boolean(b) => {
                self.advance()?;
                Ok(Value::Boolean(b))
            }
            Token::Null => {
                self.advance()?;
                Ok(Value::Null)
            }
            Token::Minus => {
                self.advance()?;
                match self.current_token {
                    Token::Integer(n) => {
                        self.advance()?;
                        Ok(Value::Integer(-n))
                    }
                    Token::Float(n) => {
                        self.advance()?;
                        Ok(Value::Float(-n))
                    }
                    _ => self.error("a number after '-'"),
                }
            }
            Token::LParen => {
                self.advance()?;
                let mut items = vec![];
                while !self.check(&Token::RParen) {
                    items.push(self.parse_value()?);
                    if !self.check(&Token::RParen) {
                        self.expect(Token::Comma)?;
                    }
                }
                self.expect(Token::RParen)?;
                Ok(Value::Tuple(items))
            }
            Token::WordSet => {
                self.advance()?;
                self.expect(Token::LBracket)?;
                let name = self.expect_string("a quoted word set name")?;
                self.expect(Token::RBracket)?;
                Ok(Value::SetRef(name))
            }
            other => {
                self.current_token = other;
                self.error("a value")
            }
        }
    }

    pub fn parse_set_expression(&mut self) -> ParseResult<SetExpression> {
        let first = self.parse_set_operand()?;
        let mut rest = vec![];

        loop {
            let op = match &self.current_token {
                Token::Pipe => SetOperator::Union,
                Token::Minus => SetOperator::Difference,
                Token::Ampersand => SetOperator::Intersection,
                _ => break,
            };
            self.advance()?;
            rest.push((op, self.parse_set_operand()?));
        }

        Ok(SetExpression { first, rest })
    }

    fn parse_set_operand(&mut self) -> ParseResult<SetOperand> {
        if self.check(&Token::LParen) {
            self.advance()?;
            let expr = self.parse_set_expression()?;
            self.expect(Token::RParen)?;
            return Ok(SetOperand::Group(Box::new(expr)));
        }
        Ok(SetOperand::Name(self.expect_identifier("a set name")?))
    }
}
