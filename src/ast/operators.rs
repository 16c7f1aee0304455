use std::fmt;

/// Comparison operators used in filter terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MathOperator {
    /// Equal (`=`)
    Equal,
    /// Not equal (`!=`)
    NotEqual,
    /// Greater than (`>`)
    GreaterThan,
    /// Less than (`<`)
    LessThan,
    /// Greater than or equal (`>=`)
    GreaterEqual,
    /// Less than or equal (`<=`)
    LessEqual,
    /// Regular expression match (`~`)
    Match,
    /// Negated regular expression match (`!~`)
    NotMatch,
    /// Case-insensitive pattern match (`like`)
    Like,
    /// Negated pattern match (`not like`)
    NotLike,
    /// Collection membership on the field side (`has`)
    Has,
    /// Membership in a tuple or word set (`in`)
    In,
    /// Negated membership (`not in`)
    NotIn,
}

impl MathOperator {
    /// Operator spellings, longest match first.
    ///
    /// ORDER IS IMPORTANT: `>=` must be tried before `>` and `=`, and the
    /// two-word forms before their one-word suffixes.
    pub const TABLE: &'static [(&'static str, MathOperator)] = &[
        (">=", MathOperator::GreaterEqual),
        ("<=", MathOperator::LessEqual),
        ("!=", MathOperator::NotEqual),
        ("!~", MathOperator::NotMatch),
        ("not like", MathOperator::NotLike),
        ("not in", MathOperator::NotIn),
        ("like", MathOperator::Like),
        ("has", MathOperator::Has),
        ("in", MathOperator::In),
        ("=", MathOperator::Equal),
        (">", MathOperator::GreaterThan),
        ("<", MathOperator::LessThan),
        ("~", MathOperator::Match),
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MathOperator::Equal => "=",
            MathOperator::NotEqual => "!=",
            MathOperator::GreaterThan => ">",
            MathOperator::LessThan => "<",
            MathOperator::GreaterEqual => ">=",
            MathOperator::LessEqual => "<=",
            MathOperator::Match => "~",
            MathOperator::NotMatch => "!~",
            MathOperator::Like => "like",
            MathOperator::NotLike => "not like",
            MathOperator::Has => "has",
            MathOperator::In => "in",
            MathOperator::NotIn => "not in",
        }
    }
}

impl fmt::Display for MathOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operators joining filter operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOperator {
    /// Logical AND (`AND`)
    And,
    /// Logical OR (`OR`)
    Or,
}

impl BoolOperator {
    /// Folds one more operand into the running result. The right operand is
    /// only evaluated when it can change the outcome.
    pub fn apply(&self, left: bool, right: impl FnOnce() -> bool) -> bool {
        match self {
            BoolOperator::And => left && right(),
            BoolOperator::Or => left || right(),
        }
    }
}

impl fmt::Display for BoolOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoolOperator::And => f.write_str("AND"),
            BoolOperator::Or => f.write_str("OR"),
        }
    }
}

/// Operators joining set operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOperator {
    /// Union (`|`)
    Union,
    /// Difference (`-`)
    Difference,
    /// Intersection (`&`)
    Intersection,
}

impl fmt::Display for SetOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetOperator::Union => f.write_str("|"),
            SetOperator::Difference => f.write_str("-"),
            SetOperator::Intersection => f.write_str("&"),
        }
    }
}

/// Operators comparing a group's cardinality in `HAVING count <op> <n>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HavingOperator {
    Equal,
    NotEqual,
    GreaterThan,
    LessThan,
    GreaterEqual,
    LessEqual,
}

impl HavingOperator {
    pub fn from_math(op: MathOperator) -> Option<Self> {
        match op {
            MathOperator::Equal => Some(HavingOperator::Equal),
            MathOperator::NotEqual => Some(HavingOperator::NotEqual),
            MathOperator::GreaterThan => Some(HavingOperator::GreaterThan),
            MathOperator::LessThan => Some(HavingOperator::LessThan),
            MathOperator::GreaterEqual => Some(HavingOperator::GreaterEqual),
            MathOperator::LessEqual => Some(HavingOperator::LessEqual),
            _ => None,
        }
    }

    pub fn holds(&self, count: i64, value: i64) -> bool {
        match self {
            HavingOperator::Equal => count == value,
            HavingOperator::NotEqual => count != value,
            HavingOperator::GreaterThan => count > value,
            HavingOperator::LessThan => count < value,
            HavingOperator::GreaterEqual => count >= value,
            HavingOperator::LessEqual => count <= value,
        }
    }
}

impl fmt::Display for HavingOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HavingOperator::Equal => "=",
            HavingOperator::NotEqual => "!=",
            HavingOperator::GreaterThan => ">",
            HavingOperator::LessThan => "<",
            HavingOperator::GreaterEqual => ">=",
            HavingOperator::LessEqual => "<=",
        };
        f.write_str(s)
    }
}
