//! # VQL - Abstract Syntax Tree
//!
//! This module defines the Abstract Syntax Tree (AST) for VQL, a small
//! command language for selecting, filtering and combining named sets of
//! features held in a workspace.
//!
//! ## Architecture Overview
//!
//! The AST module is organized into focused submodules:
//!
//! - **[tokens]** - Lexical tokens produced by the lexer
//! - **[operators]** - Comparison, boolean, set and `HAVING` operators
//! - **[expressions]** - Field identifiers, filter and set expressions
//! - **[commands]** - The nine command forms and the batch [`Model`]
//!
//! ## Quick Start
//!
//! ```text
//! CREATE high FROM variants WHERE score >= 10;
//! COUNT FROM high;
//! ```
//!
//! ## Core Concepts
//!
//! ### Commands
//!
//! A script is a sequence of `;`-terminated commands executed strictly in
//! source order. `#` starts a comment running to the end of the line.
//!
//! ### Flat operand chains
//!
//! Filter expressions (`AND`, `OR`) and set expressions (`|`, `-`, `&`) are
//! flat chains folded left to right. Neither family has operator precedence;
//! parentheses are the only way to regroup:
//!
//! ```text
//! a = 1 AND b = 2 OR c = 3      # (a = 1 AND b = 2) OR c = 3
//! CREATE x = a | b - c          # (a | b) - c
//! ```
//!
//! ### Values
//!
//! Right-hand sides of filter terms are literals: numbers, quoted strings,
//! `true`/`false`, `NULL`, tuples such as `('A', 'C')` and word set references
//! such as `WORDSET['panel']`.
//!
//! ## Examples
//!
//! ### Grouping
//!
//! ```text
//! SELECT chr FROM variants GROUP BY chr HAVING count > 2
//! ```
//!
//! ### Functions
//!
//! ```text
//! SELECT chr, pos, sample['TUMOR'].gt FROM variants WHERE sample['TUMOR'].dp > 10
//! ```
//!
//! ### Interval intersection
//!
//! ```text
//! CREATE targeted FROM variants INTERSECT "/data/panel.bed"
//! ```
pub mod commands;
pub mod expressions;
pub mod operators;
pub mod tokens;

pub use commands::{Command, GroupBy, Having, Model};
pub use expressions::{
    FieldIdentifier, FilterExpression, FilterOperand, FilterTerm, SetExpression, SetOperand,
};
pub use operators::{BoolOperator, HavingOperator, MathOperator, SetOperator};
pub use tokens::Token;
