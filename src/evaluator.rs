use std::cmp::Ordering;
use std::sync::Arc;

use regex::{Regex, RegexBuilder};

use crate::{
    ast::{BoolOperator, FilterExpression, FilterOperand, FilterTerm, MathOperator},
    error::{Result, VqlError},
    functions::{FunctionRegistry, ResolvedField, lookup_wordset},
    loader::WordSetResolver,
    value::{Feature, Value, WordSet},
    workspace::Workspace,
};

/// Everything needed to turn a parsed filter into an executable one.
pub struct FilterContext<'a> {
    pub functions: &'a FunctionRegistry,
    pub workspace: &'a Workspace,
    pub wordsets: &'a dyn WordSetResolver,
    pub regex_size_limit: usize,
}

/// Right-hand side of a membership test.
#[derive(Debug, Clone)]
enum Members {
    Values(Vec<Value>),
    Words(Arc<WordSet>),
}

impl Members {
    fn contains(&self, value: &Value) -> bool {
        match self {
            Members::Values(values) => values.iter().any(|v| v.loosely_equals(value)),
            Members::Words(words) => match value {
                Value::String(s) => words.contains(s),
                Value::Integer(_) | Value::Float(_) => words.contains(&value.as_text()),
                _ => false,
            },
        }
    }

    fn iter_values(&self) -> Box<dyn Iterator<Item = Value> + '_> {
        match self {
            Members::Values(values) => Box::new(values.iter().cloned()),
            Members::Words(words) => Box::new(words.iter().map(|w| Value::String(w.clone()))),
        }
    }
}

#[derive(Debug, Clone)]
enum TermTest {
    Compare(MathOperator, Value),
    Pattern { regex: Regex, negated: bool },
    Has(Members),
    In { members: Members, negated: bool },
}

#[derive(Clone)]
struct CompiledTerm {
    field: ResolvedField,
    test: TermTest,
}

#[derive(Clone)]
enum CompiledOperand {
    Term(CompiledTerm),
    Group(Box<CompiledFilter>),
}

/// A filter expression with functions, word sets and patterns resolved.
///
/// Compiling performs every check that can fail; evaluating a compiled
/// filter against a feature never fails.
#[derive(Clone)]
pub struct CompiledFilter {
    first: CompiledOperand,
    rest: Vec<(BoolOperator, CompiledOperand)>,
}

impl CompiledFilter {
    pub fn compile(expr: &FilterExpression, ctx: &FilterContext<'_>) -> Result<Self> {
        let first = compile_operand(&expr.first, ctx)?;
        let rest = expr
            .rest
            .iter()
            .map(|(op, operand)| Ok((*op, compile_operand(operand, ctx)?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(CompiledFilter { first, rest })
    }

    /// Folds the operand chain strictly left to right.
    pub fn matches(&self, feature: &Feature) -> bool {
        let mut result = self.first.matches(feature);
        for (op, operand) in &self.rest {
            result = op.apply(result, || operand.matches(feature));
        }
        result
    }
}

impl CompiledOperand {
    fn matches(&self, feature: &Feature) -> bool {
        match self {
            CompiledOperand::Term(term) => term.matches(feature),
            CompiledOperand::Group(filter) => filter.matches(feature),
        }
    }
}

fn compile_operand(operand: &FilterOperand, ctx: &FilterContext<'_>) -> Result<CompiledOperand> {
    match operand {
        FilterOperand::Term(term) => Ok(CompiledOperand::Term(compile_term(term, ctx)?)),
        FilterOperand::Group(expr) => Ok(CompiledOperand::Group(Box::new(
            CompiledFilter::compile(expr, ctx)?,
        ))),
    }
}

fn compile_term(term: &FilterTerm, ctx: &FilterContext<'_>) -> Result<CompiledTerm> {
    let field = ctx.functions.resolve(&term.field)?;
    let test = match term.op {
        MathOperator::Equal
        | MathOperator::NotEqual
        | MathOperator::GreaterThan
        | MathOperator::LessThan
        | MathOperator::GreaterEqual
        | MathOperator::LessEqual => {
            if let Value::SetRef(name) = &term.value {
                return Err(VqlError::TypeMismatch(format!(
                    "operator '{}' cannot compare with WORDSET['{}']; use 'in' or 'has'",
                    term.op, name
                )));
            }
            TermTest::Compare(term.op, term.value.clone())
        }
        MathOperator::Match | MathOperator::NotMatch => {
            let pattern = pattern_operand(term)?;
            TermTest::Pattern {
                regex: build_regex(pattern, pattern, false, ctx.regex_size_limit)?,
                negated: term.op == MathOperator::NotMatch,
            }
        }
        MathOperator::Like | MathOperator::NotLike => {
            let pattern = pattern_operand(term)?;
            TermTest::Pattern {
                regex: build_regex(&like_to_regex(pattern), pattern, true, ctx.regex_size_limit)?,
                negated: term.op == MathOperator::NotLike,
            }
        }
        MathOperator::Has => TermTest::Has(match &term.value {
            Value::Tuple(_) | Value::SetRef(_) => members(&term.value, ctx)?,
            scalar => Members::Values(vec![scalar.clone()]),
        }),
        MathOperator::In | MathOperator::NotIn => match &term.value {
            Value::Tuple(_) | Value::SetRef(_) => TermTest::In {
                members: members(&term.value, ctx)?,
                negated: term.op == MathOperator::NotIn,
            },
            other => {
                return Err(VqlError::TypeMismatch(format!(
                    "operator '{}' needs a tuple or a word set, got {}",
                    term.op,
                    other.type_name()
                )));
            }
        },
    };
    Ok(CompiledTerm { field, test })
}

fn pattern_operand(term: &FilterTerm) -> Result<&str> {
    term.value.as_str().ok_or_else(|| {
        VqlError::TypeMismatch(format!(
            "operator '{}' needs a string pattern, got {}",
            term.op,
            term.value.type_name()
        ))
    })
}

fn members(value: &Value, ctx: &FilterContext<'_>) -> Result<Members> {
    match value {
        Value::Tuple(items) => Ok(Members::Values(items.clone())),
        Value::SetRef(name) => Ok(Members::Words(lookup_wordset(
            ctx.workspace,
            ctx.wordsets,
            name,
        )?)),
        other => Ok(Members::Values(vec![other.clone()])),
    }
}

fn build_regex(source: &str, pattern: &str, case_insensitive: bool, limit: usize) -> Result<Regex> {
    RegexBuilder::new(source)
        .case_insensitive(case_insensitive)
        .size_limit(limit)
        .build()
        .map_err(|e| VqlError::InvalidPattern {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })
}

/// `%`/`*` match any run and `_`/`?` a single character, anchored at both
/// ends. Without wildcards the pattern is a plain substring.
fn like_to_regex(pattern: &str) -> String {
    let has_wildcard = pattern.contains(['%', '*', '_', '?']);
    if !has_wildcard {
        return regex::escape(pattern);
    }
    let mut out = String::from("^");
    for ch in pattern.chars() {
        match ch {
            '%' | '*' => out.push_str(".*"),
            '_' | '?' => out.push('.'),
            c => out.push_str(&regex::escape(&c.to_string())),
        }
    }
    out.push('$');
    out
}

impl CompiledTerm {
    fn matches(&self, feature: &Feature) -> bool {
        let value = self.field.extract(feature);
        match &self.test {
            TermTest::Compare(op, rhs) => compare(*op, &value, rhs),
            TermTest::Pattern { regex, negated } => match value.as_str() {
                Some(s) => regex.is_match(s) != *negated,
                None => false,
            },
            TermTest::Has(members) => has(&value, members),
            TermTest::In { members, negated } => {
                if value.is_null() {
                    return *negated;
                }
                members.contains(&value) != *negated
            }
        }
    }
}

fn compare(op: MathOperator, left: &Value, right: &Value) -> bool {
    match op {
        MathOperator::Equal => left.loosely_equals(right),
        MathOperator::NotEqual => {
            if left.is_null() || right.is_null() {
                return !left.loosely_equals(right);
            }
            match (left, right) {
                (Value::Tuple(_), Value::Tuple(_)) => !left.loosely_equals(right),
                _ => left.compare(right).is_some_and(|o| o != Ordering::Equal),
            }
        }
        MathOperator::GreaterThan => left.compare(right) == Some(Ordering::Greater),
        MathOperator::LessThan => left.compare(right) == Some(Ordering::Less),
        MathOperator::GreaterEqual => left
            .compare(right)
            .is_some_and(|o| o != Ordering::Less),
        MathOperator::LessEqual => left
            .compare(right)
            .is_some_and(|o| o != Ordering::Greater),
        _ => false,
    }
}

fn has(value: &Value, members: &Members) -> bool {
    match value {
        Value::Tuple(items) => members
            .iter_values()
            .any(|m| items.iter().any(|item| item.loosely_equals(&m))),
        Value::String(s) => members
            .iter_values()
            .any(|m| m.as_str().is_some_and(|needle| s.contains(needle))),
        _ => false,
    }
}
