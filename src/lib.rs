//! A query language over named sets of features.
//!
//! Text is parsed into a [`Model`] of commands, which an [`Engine`] runs
//! against a [`Workspace`]:
//!
//! ```
//! use vql_lang::{Engine, Feature, FeatureSet, Outcome, Workspace};
//!
//! let mut workspace = Workspace::new();
//! workspace.bind(
//!     "variants",
//!     FeatureSet::selection(vec![
//!         Feature::new().with("chr", "chr1").with("score", 12),
//!         Feature::new().with("chr", "chr2").with("score", 4),
//!     ]),
//! );
//!
//! let engine = Engine::new();
//! let outcomes = engine
//!     .run(&mut workspace, "CREATE high FROM variants WHERE score >= 10; COUNT FROM high;")
//!     .unwrap();
//! assert_eq!(outcomes[1], Outcome::Count(1));
//! ```

pub mod ast;
pub mod config;
pub mod convert;
pub mod error;
pub mod evaluator;
pub mod executor;
pub mod functions;
pub mod lexer;
pub mod loader;
pub mod output;
pub mod parser;
pub mod sets;
pub mod value;
pub mod workspace;

pub use ast::{Command, Model, Token};
pub use config::EngineConfig;
pub use error::{ErrorKind, Result, VqlError};
pub use executor::{CancellationToken, Engine, Outcome};
pub use functions::FunctionRegistry;
pub use lexer::{LexError, Lexer, Position};
pub use loader::{
    FeatureLoader, JsonFileLoader, LoadError, MemoryLoader, MemoryWordSets, WordSetResolver,
};
pub use output::Table;
pub use parser::{ParseError, Parser, parse};
pub use value::{Feature, FeatureSet, Value, WordSet};
pub use workspace::{SharedWorkspace, Workspace};
