use crate::ast::MathOperator;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Keywords
    /// `SELECT`
    Select,
    /// `FROM`
    From,
    /// `WHERE`
    Where,
    /// `GROUP`, only valid when followed by `BY`
    Group,
    /// `BY`
    By,
    /// `HAVING`
    Having,
    /// `CREATE`
    Create,
    /// `INTERSECT`
    Intersect,
    /// `COUNT`
    Count,
    /// `DROP`
    Drop,
    /// `SHOW`
    Show,
    /// `IMPORT`
    Import,
    /// `AS`
    As,

    /// Word set reference prefix
    ///
    /// # Examples
    /// ```text
    /// gene in WORDSET['panel']
    /// ```
    WordSet,

    // Logical
    /// Logical AND (upper case word)
    And,

    /// Logical OR (upper case word)
    Or,

    // Literals
    /// Floating-point number
    ///
    /// # Examples
    /// ```text
    /// 3.14
    /// 1e-5
    /// ```
    Float(f64),

    /// Integer
    ///
    /// # Examples
    /// ```text
    /// 42
    /// 10
    /// ```
    Integer(i64),

    /// String literal enclosed in single or double quotes
    ///
    /// # Examples
    /// ```text
    /// 'chr1'
    /// "/data/x.bed"
    /// ```
    String(String),

    /// Boolean values
    ///
    /// # Examples
    /// ```text
    /// true
    /// false
    /// ```
    Boolean(bool),

    /// `NULL`
    Null,

    /// Field or set name
    ///
    /// Must start with a letter or underscore, followed by letters, digits or
    /// underscores, optionally followed by a single `.segment`.
    ///
    /// # Examples
    /// ```text
    /// chr
    /// ann.gene
    /// _internal
    /// ```
    Identifier(String),

    /// Comparison operator, symbolic or word form
    ///
    /// # Examples
    /// ```text
    /// >=
    /// not like
    /// in
    /// ```
    Operator(MathOperator),

    // Set operators
    /// Union (`|`)
    Pipe,

    /// Difference (`-`), also the sign of a negative number
    Minus,

    /// Intersection (`&`)
    Ampersand,

    // Delimiters
    /// Left parenthesis for grouping or tuples
    LParen,

    /// Right parenthesis
    RParen,

    /// Left bracket for function arguments
    LBracket,

    /// Right bracket
    RBracket,

    /// Comma for separating fields or tuple elements
    Comma,

    /// Dot for function accessors
    Dot,

    /// Command terminator
    Semicolon,

    /// End of input
    Eof,
}

impl Token {
    /// Maps an upper case keyword onto its token.
    pub fn keyword(word: &str) -> Option<Token> {
        let token = match word {
            "SELECT" => Token::Select,
            "FROM" => Token::From,
            "WHERE" => Token::Where,
            "GROUP" => Token::Group,
            "BY" => Token::By,
            "HAVING" => Token::Having,
            "CREATE" => Token::Create,
            "INTERSECT" => Token::Intersect,
            "COUNT" => Token::Count,
            "DROP" => Token::Drop,
            "SHOW" => Token::Show,
            "IMPORT" => Token::Import,
            "AS" => Token::As,
            "AND" => Token::And,
            "OR" => Token::Or,
            "NULL" => Token::Null,
            "WORDSET" => Token::WordSet,
            "true" => Token::Boolean(true),
            "false" => Token::Boolean(false),
            _ => return None,
        };
        Some(token)
    }

    /// Short human-readable description used in syntax errors.
    pub fn describe(&self) -> String {
        match self {
            Token::Identifier(name) => format!("identifier '{}'", name),
            Token::String(s) => format!("string '{}'", s),
            Token::Integer(n) => format!("number {}", n),
            Token::Float(n) => format!("number {}", n),
            Token::Boolean(b) => format!("boolean {}", b),
            Token::Operator(op) => format!("operator '{}'", op),
            Token::Eof => "end of input".to_string(),
            other => format!("{:?}", other),
        }
    }
}
