//! Function and word set resolution.
//!
//! `name['arg'].extra` field identifiers and `WORDSET['name']` values are
//! accepted by the parser for any name. They are resolved here, when a
//! command executes, so an unknown name is a resolution error rather than a
//! syntax error.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::ast::FieldIdentifier;
use crate::error::{Result, VqlError};
use crate::loader::WordSetResolver;
use crate::value::{Feature, Value, WordSet};
use crate::workspace::Workspace;

/// Value extraction behind `name['arg'].extra`.
pub trait FieldFunction: Send + Sync {
    fn call(&self, feature: &Feature, arg: &str, extra: Option<&str>) -> Value;
}

impl<F> FieldFunction for F
where
    F: Fn(&Feature, &str, Option<&str>) -> Value + Send + Sync,
{
    fn call(&self, feature: &Feature, arg: &str, extra: Option<&str>) -> Value {
        self(feature, arg, extra)
    }
}

/// `sample['TUMOR'].gt` reads the field `sample.TUMOR.gt`.
struct SampleField;

impl FieldFunction for SampleField {
    fn call(&self, feature: &Feature, arg: &str, extra: Option<&str>) -> Value {
        let key = match extra {
            Some(extra) => format!("sample.{}.{}", arg, extra),
            None => format!("sample.{}", arg),
        };
        feature.get(&key).cloned().unwrap_or(Value::Null)
    }
}

/// `field['allele frequency']` reads a field whose name is not an identifier.
struct RawField;

impl FieldFunction for RawField {
    fn call(&self, feature: &Feature, arg: &str, extra: Option<&str>) -> Value {
        let value = match extra {
            Some(extra) => feature.get(&format!("{}.{}", arg, extra)),
            None => feature.get(arg),
        };
        value.cloned().unwrap_or(Value::Null)
    }
}

#[derive(Clone)]
pub struct FunctionRegistry {
    functions: HashMap<String, Arc<dyn FieldFunction>>,
}

impl FunctionRegistry {
    pub fn empty() -> Self {
        FunctionRegistry {
            functions: HashMap::new(),
        }
    }

    /// Registry holding the built-in `sample` and `field` functions.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register("sample", SampleField);
        registry.register("field", RawField);
        registry
    }

    pub fn register(&mut self, name: impl Into<String>, function: impl FieldFunction + 'static) {
        self.functions.insert(name.into(), Arc::new(function));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn FieldFunction>> {
        self.functions
            .get(name)
            .cloned()
            .ok_or_else(|| VqlError::UnknownFunction(name.to_string()))
    }

    /// Binds a parsed field identifier to its extraction behaviour.
    pub fn resolve(&self, field: &FieldIdentifier) -> Result<ResolvedField> {
        match field {
            FieldIdentifier::Field(name) => Ok(ResolvedField::Field(name.clone())),
            FieldIdentifier::Function { name, arg, extra } => Ok(ResolvedField::Function {
                function: self.get(name)?,
                arg: arg.clone(),
                extra: extra.clone(),
            }),
        }
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.functions.keys().collect();
        names.sort();
        f.debug_struct("FunctionRegistry")
            .field("functions", &names)
            .finish()
    }
}

/// A field identifier whose function, if any, has been found.
#[derive(Clone)]
pub enum ResolvedField {
    Field(String),
    Function {
        function: Arc<dyn FieldFunction>,
        arg: String,
        extra: Option<String>,
    },
}

impl ResolvedField {
    /// Missing fields read as `Null`.
    pub fn extract(&self, feature: &Feature) -> Value {
        match self {
            ResolvedField::Field(name) => feature.get(name).cloned().unwrap_or(Value::Null),
            ResolvedField::Function {
                function,
                arg,
                extra,
            } => function.call(feature, arg, extra.as_deref()),
        }
    }
}

/// Looks a word set up in the workspace first, then in the external resolver.
pub fn lookup_wordset(
    workspace: &Workspace,
    resolver: &dyn WordSetResolver,
    name: &str,
) -> Result<Arc<WordSet>> {
    if let Some(words) = workspace.wordset(name) {
        return Ok(words);
    }
    match resolver.resolve_wordset(name) {
        Ok(Some(words)) => Ok(Arc::new(words)),
        Ok(None) => Err(VqlError::UnknownWordSet(name.to_string())),
        Err(source) => Err(VqlError::Io {
            path: name.to_string(),
            source,
        }),
    }
}
