use std::fmt;

use crate::ast::{BoolOperator, MathOperator, SetOperator};
use crate::value::{Value, quote};

/// A reference to a value carried by a feature.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldIdentifier {
    /// Bare field name, optionally with one dotted segment
    ///
    /// # Examples
    /// ```text
    /// chr
    /// ann.gene
    /// ```
    Field(String),

    /// Function application with an optional accessor
    ///
    /// The function name is validated when the command executes, not when it
    /// is parsed.
    ///
    /// # Examples
    /// ```text
    /// sample['TUMOR'].gt
    /// field['allele frequency']
    /// ```
    Function {
        name: String,
        arg: String,
        extra: Option<String>,
    },
}

impl FieldIdentifier {
    pub fn field(name: impl Into<String>) -> Self {
        FieldIdentifier::Field(name.into())
    }
}

impl fmt::Display for FieldIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldIdentifier::Field(name) => f.write_str(name),
            FieldIdentifier::Function { name, arg, extra } => {
                write!(f, "{}[{}]", name, quote(arg))?;
                if let Some(extra) = extra {
                    write!(f, ".{}", extra)?;
                }
                Ok(())
            }
        }
    }
}

/// A single `field operator value` comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterTerm {
    pub field: FieldIdentifier,
    pub op: MathOperator,
    pub value: Value,
}

impl fmt::Display for FilterTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.field, self.op, self.value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterOperand {
    Term(FilterTerm),
    /// Parenthesized sub-expression
    Group(Box<FilterExpression>),
}

impl fmt::Display for FilterOperand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterOperand::Term(term) => write!(f, "{}", term),
            FilterOperand::Group(expr) => write!(f, "({})", expr),
        }
    }
}

/// Flat operand chain joined by `AND`/`OR`.
///
/// There is no precedence between the two operators: the chain is folded
/// strictly left to right, so `a AND b OR c` means `(a AND b) OR c` and
/// `a OR b AND c` means `(a OR b) AND c`.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterExpression {
    pub first: FilterOperand,
    pub rest: Vec<(BoolOperator, FilterOperand)>,
}

impl FilterExpression {
    pub fn single(term: FilterTerm) -> Self {
        FilterExpression {
            first: FilterOperand::Term(term),
            rest: vec![],
        }
    }

    /// Iterates over every term, descending into groups.
    pub fn terms(&self) -> Vec<&FilterTerm> {
        let mut terms = vec![];
        collect_terms(&self.first, &mut terms);
        for (_, operand) in &self.rest {
            collect_terms(operand, &mut terms);
        }
        terms
    }
}

fn collect_terms<'a>(operand: &'a FilterOperand, out: &mut Vec<&'a FilterTerm>) {
    match operand {
        FilterOperand::Term(term) => out.push(term),
        FilterOperand::Group(expr) => {
            collect_terms(&expr.first, out);
            for (_, operand) in &expr.rest {
                collect_terms(operand, out);
            }
        }
    }
}

impl fmt::Display for FilterExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.first)?;
        for (op, operand) in &self.rest {
            write!(f, " {} {}", op, operand)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SetOperand {
    /// Name of a set in the workspace
    Name(String),
    /// Parenthesized sub-expression
    Group(Box<SetExpression>),
}

impl fmt::Display for SetOperand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetOperand::Name(name) => f.write_str(name),
            SetOperand::Group(expr) => write!(f, "({})", expr),
        }
    }
}

/// Flat operand chain joined by `|`, `-` and `&`, folded left to right.
#[derive(Debug, Clone, PartialEq)]
pub struct SetExpression {
    pub first: SetOperand,
    pub rest: Vec<(SetOperator, SetOperand)>,
}

impl SetExpression {
    /// Every set name the expression refers to, in source order.
    pub fn names(&self) -> Vec<&str> {
        let mut names = vec![];
        collect_names(&self.first, &mut names);
        for (_, operand) in &self.rest {
            collect_names(operand, &mut names);
        }
        names
    }
}

fn collect_names<'a>(operand: &'a SetOperand, out: &mut Vec<&'a str>) {
    match operand {
        SetOperand::Name(name) => out.push(name),
        SetOperand::Group(expr) => {
            collect_names(&expr.first, out);
            for (_, operand) in &expr.rest {
                collect_names(operand, out);
            }
        }
    }
}

impl fmt::Display for SetExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.first)?;
        for (op, operand) in &self.rest {
            write!(f, " {} {}", op, operand)?;
        }
        Ok(())
    }
}
