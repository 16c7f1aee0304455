use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};

use rust_decimal::{Decimal, prelude::FromPrimitive};

/// A value carried by a feature field or written as a literal in a query.
///
/// # Type Preservation
///
/// Integers and floats are kept apart. Filter comparisons treat them as
/// numbers (`10 = 10.0` holds) while feature identity, used by set algebra,
/// keeps them distinct.
///
/// # Examples
///
/// ```
/// use vql_lang::Value;
///
/// let null = Value::Null;
/// let boolean = Value::Boolean(true);
/// let integer = Value::Integer(42);
/// let float = Value::Float(3.14);
/// let string = Value::String("chr1".to_string());
/// let tuple = Value::Tuple(vec![Value::Integer(1), Value::Integer(2)]);
/// let words = Value::SetRef("panel".to_string());
/// ```
#[derive(Debug, Clone)]
pub enum Value {
    /// Missing or explicit `NULL`
    Null,

    Boolean(bool),

    /// Integer number (preserved separately from floats)
    Integer(i64),

    /// Floating-point number
    Float(f64),

    /// UTF-8 string
    String(String),

    /// Ordered sequence of values
    Tuple(Vec<Value>),

    /// Unresolved reference to a named word set (`WORDSET['name']`)
    SetRef(String),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Tuple(_) => "tuple",
            Value::SetRef(_) => "word set",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Plain rendering used by tables and word lists (strings unquoted).
    pub fn as_text(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::Integer(n) => n.to_string(),
            Value::Float(n) => n.to_string(),
            Value::String(s) => s.clone(),
            Value::Tuple(items) => items
                .iter()
                .map(Value::as_text)
                .collect::<Vec<_>>()
                .join(","),
            Value::SetRef(name) => format!("WORDSET[{}]", quote(name)),
        }
    }

    /// Ordering used by filter comparisons.
    ///
    /// Numbers compare across integer and float; strings and booleans compare
    /// with their own kind. Every other pairing is unordered.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Integer(a), Value::Float(b)) => compare_mixed(*a, *b),
            (Value::Float(a), Value::Integer(b)) => compare_mixed(*b, *a).map(Ordering::reverse),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Equality used by filter comparisons and membership tests.
    pub fn loosely_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Tuple(a), Value::Tuple(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.loosely_equals(y))
            }
            _ => self.compare(other) == Some(Ordering::Equal),
        }
    }
}

fn compare_mixed(integer: i64, float: f64) -> Option<Ordering> {
    if let Some(a) = Decimal::from_i64(integer)
        && let Some(b) = Decimal::from_f64(float)
    {
        return Some(a.cmp(&b));
    }
    (integer as f64).partial_cmp(&float)
}

/// Structural identity: same kind and same contents, floats compared bitwise.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Tuple(a), Value::Tuple(b)) => a == b,
            (Value::SetRef(a), Value::SetRef(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Boolean(b) => b.hash(state),
            Value::Integer(n) => n.hash(state),
            Value::Float(n) => n.to_bits().hash(state),
            Value::String(s) => s.hash(state),
            Value::Tuple(items) => items.hash(state),
            Value::SetRef(name) => name.hash(state),
        }
    }
}

/// Canonical literal form; parsing the output yields the same value.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(n) => write!(f, "{}", n),
            // Debug keeps a fractional part or exponent, so the literal lexes as a float
            Value::Float(n) => write!(f, "{:?}", n),
            Value::String(s) => f.write_str(&quote(s)),
            Value::Tuple(items) => {
                f.write_str("(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str(")")
            }
            Value::SetRef(name) => write!(f, "WORDSET[{}]", quote(name)),
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Integer(n as i64)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

/// Single-quoted string literal with escapes.
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for ch in s.chars() {
        match ch {
            '\'' => out.push_str("\\'"),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// A single record: an ordered mapping from field name to value.
///
/// Field order is kept for display; identity ignores it.
#[derive(Debug, Clone, Default)]
pub struct Feature {
    fields: Vec<(String, Value)>,
}

impl Feature {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Inserts a field, replacing the value of an existing field of the same name.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn sorted(&self) -> Vec<&(String, Value)> {
        let mut sorted: Vec<_> = self.fields.iter().collect();
        sorted.sort_by(|a, b| a.0.cmp(&b.0));
        sorted
    }
}

impl PartialEq for Feature {
    fn eq(&self, other: &Self) -> bool {
        self.fields.len() == other.fields.len()
            && self
                .fields
                .iter()
                .all(|(name, value)| other.get(name) == Some(value))
    }
}

impl Eq for Feature {}

impl Hash for Feature {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for (name, value) in self.sorted() {
            name.hash(state);
            value.hash(state);
        }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Feature {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut feature = Feature::new();
        for (k, v) in iter {
            feature.insert(k, v);
        }
        feature
    }
}

/// Literal words referenced through `WORDSET['name']`.
pub type WordSet = BTreeSet<String>;

/// Kind tag of sets produced by queries rather than imports.
pub const SELECTION_KIND: &str = "selection";

/// Name of the cardinality column of grouped sets.
pub const COUNT_FIELD: &str = "count";

/// Metadata of a set produced by `GROUP BY`: its features are group keys
/// paired with a `count` field.
#[derive(Debug, Clone, PartialEq)]
pub struct Grouping {
    pub keys: Vec<String>,
}

/// An immutable, ordered collection of features.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSet {
    pub kind: String,
    pub features: Vec<Feature>,
    pub grouping: Option<Grouping>,
}

impl FeatureSet {
    pub fn new(kind: impl Into<String>, features: Vec<Feature>) -> Self {
        FeatureSet {
            kind: kind.into(),
            features,
            grouping: None,
        }
    }

    pub fn selection(features: Vec<Feature>) -> Self {
        Self::new(SELECTION_KIND, features)
    }

    pub fn grouped(features: Vec<Feature>, keys: Vec<String>) -> Self {
        FeatureSet {
            kind: SELECTION_KIND.to_string(),
            features,
            grouping: Some(Grouping { keys }),
        }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Feature> {
        self.features.iter()
    }

    /// Union of field names in order of first appearance.
    pub fn schema(&self) -> Vec<String> {
        let mut names: Vec<String> = vec![];
        for feature in &self.features {
            for name in feature.names() {
                if !names.iter().any(|n| n == name) {
                    names.push(name.to_string());
                }
            }
        }
        names
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.features.iter().any(|f| f.contains(name))
    }
}
