//! Rendering of command outcomes.
//!
//! The engine never prints. Callers either inspect the returned
//! [`Outcome`]s or hand them to an [`OutputSink`]:
//!
//! - [`TextSink`] - tab-separated tables and one-line messages
//! - [`JsonSink`] - one JSON document per outcome, compact or pretty
//! - [`MemorySink`] - keeps the outcomes for later inspection
//!
//! # Examples
//!
//! ```
//! use vql_lang::{Engine, Workspace};
//! use vql_lang::output::TextSink;
//!
//! let engine = Engine::new();
//! let mut workspace = Workspace::new();
//! let mut sink = TextSink::new(Vec::new());
//! engine.run_into(&mut workspace, "SHOW selections;", &mut sink).unwrap();
//! assert_eq!(String::from_utf8(sink.into_inner()).unwrap(), "name\tkind\tcount\n");
//! ```

use std::fmt;
use std::io::{self, Write};

use crate::convert::value_to_json;
use crate::executor::Outcome;
use crate::value::{FeatureSet, Value};

/// Rows of values under named columns.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Table {
            columns,
            rows: vec![],
        }
    }

    pub fn push_row(&mut self, row: Vec<Value>) {
        self.rows.push(row);
    }

    /// Every field of every feature, missing fields as `NULL`.
    pub fn from_set(set: &FeatureSet, limit: Option<usize>) -> Self {
        let mut table = Table::new(set.schema());
        for feature in set.iter().take(limit.unwrap_or(usize::MAX)) {
            let row = table
                .columns
                .iter()
                .map(|c| feature.get(c).cloned().unwrap_or(Value::Null))
                .collect();
            table.rows.push(row);
        }
        table
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Values of one column, top to bottom.
    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let index = self.columns.iter().position(|c| c == name)?;
        Some(self.rows.iter().filter_map(|row| row.get(index)).collect())
    }

    pub fn to_json(&self) -> serde_json::Value {
        let rows = self
            .rows
            .iter()
            .map(|row| serde_json::Value::Array(row.iter().map(value_to_json).collect()))
            .collect();
        serde_json::json!({
            "columns": self.columns,
            "rows": serde_json::Value::Array(rows),
        })
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.columns.join("\t"))?;
        for row in &self.rows {
            let cells: Vec<String> = row.iter().map(Value::as_text).collect();
            writeln!(f, "{}", cells.join("\t"))?;
        }
        Ok(())
    }
}

pub fn outcome_to_json(outcome: &Outcome) -> serde_json::Value {
    match outcome {
        Outcome::Rows(table) | Outcome::Show(table) => table.to_json(),
        Outcome::Created { name, count } => serde_json::json!({
            "created": name,
            "count": count,
        }),
        Outcome::Count(count) => serde_json::json!({ "count": count }),
        Outcome::Dropped { feature, name } => serde_json::json!({
            "dropped": name,
            "feature": feature,
        }),
        Outcome::Imported {
            feature,
            name,
            count,
        } => serde_json::json!({
            "imported": name,
            "feature": feature,
            "count": count,
        }),
    }
}

/// Destination for outcomes as commands complete.
pub trait OutputSink {
    fn emit(&mut self, outcome: &Outcome) -> io::Result<()>;
}

pub struct TextSink<W: Write> {
    writer: W,
}

impl<W: Write> TextSink<W> {
    pub fn new(writer: W) -> Self {
        TextSink { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> OutputSink for TextSink<W> {
    fn emit(&mut self, outcome: &Outcome) -> io::Result<()> {
        match outcome {
            Outcome::Rows(table) | Outcome::Show(table) => write!(self.writer, "{}", table),
            other => writeln!(self.writer, "{}", other),
        }
    }
}

pub struct JsonSink<W: Write> {
    writer: W,
    pretty: bool,
}

impl<W: Write> JsonSink<W> {
    pub fn new(writer: W, pretty: bool) -> Self {
        JsonSink { writer, pretty }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> OutputSink for JsonSink<W> {
    fn emit(&mut self, outcome: &Outcome) -> io::Result<()> {
        let json = outcome_to_json(outcome);
        if self.pretty {
            serde_json::to_writer_pretty(&mut self.writer, &json)?;
        } else {
            serde_json::to_writer(&mut self.writer, &json)?;
        }
        writeln!(self.writer)
    }
}

#[derive(Debug, Default)]
pub struct MemorySink {
    pub outcomes: Vec<Outcome>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OutputSink for MemorySink {
    fn emit(&mut self, outcome: &Outcome) -> io::Result<()> {
        self.outcomes.push(outcome.clone());
        Ok(())
    }
}
