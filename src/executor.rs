//! Command execution against a [`Workspace`].
//!
//! Every command is first planned against a read-only view of the
//! workspace. Planning resolves names, validates fields, compiles filters
//! and computes the full result; only a successful plan is committed, so a
//! failing command leaves the workspace untouched.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, warn};

use crate::{
    ast::{Command, FieldIdentifier, FilterExpression, GroupBy, SetOperator},
    config::EngineConfig,
    error::{Result, VqlError},
    evaluator::{CompiledFilter, FilterContext},
    functions::{FunctionRegistry, ResolvedField},
    loader::{DirectoryWordSets, FeatureLoader, MemoryWordSets, NoLoader, WordSetResolver},
    output::{OutputSink, Table},
    parser::parse,
    sets,
    value::{COUNT_FIELD, Feature, FeatureSet, SELECTION_KIND, Value, WordSet},
    workspace::{SharedWorkspace, Workspace},
};

/// Cooperative abort flag checked between feature iterations.
///
/// Clones share the same flag, so a host can keep one and cancel from
/// another thread while the engine runs.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(VqlError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// What a successfully executed command produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Projected rows of a `SELECT`
    Rows(Table),
    Created { name: String, count: usize },
    Count(usize),
    Dropped { feature: String, name: String },
    /// Contents or listing rendered by `SHOW`
    Show(Table),
    Imported {
        feature: String,
        name: String,
        count: usize,
    },
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Rows(table) | Outcome::Show(table) => write!(f, "{}", table),
            Outcome::Created { name, count } => write!(f, "created {} ({} features)", name, count),
            Outcome::Count(count) => write!(f, "{}", count),
            Outcome::Dropped { feature, name } => write!(f, "dropped {} {}", feature, name),
            Outcome::Imported {
                feature,
                name,
                count,
            } => write!(f, "imported {} {} as {}", count, feature, name),
        }
    }
}

/// A workspace mutation computed by planning, applied only on success.
enum Change {
    BindSet { name: String, set: FeatureSet },
    DropSet { name: String },
    BindWords { name: String, words: WordSet },
    DropWords { name: String },
}

struct Plan {
    outcome: Outcome,
    change: Option<Change>,
}

impl Plan {
    fn read(outcome: Outcome) -> Self {
        Plan {
            outcome,
            change: None,
        }
    }

    fn created(name: &str, set: FeatureSet) -> Self {
        Plan {
            outcome: Outcome::Created {
                name: name.to_string(),
                count: set.len(),
            },
            change: Some(Change::BindSet {
                name: name.to_string(),
                set,
            }),
        }
    }
}

fn is_wordset_kind(feature: &str) -> bool {
    matches!(feature.to_ascii_lowercase().as_str(), "wordsets" | "wordset")
}

fn is_listing_kind(feature: &str) -> bool {
    matches!(feature.to_ascii_lowercase().as_str(), "selections" | "sets")
}

pub struct Engine {
    config: EngineConfig,
    functions: FunctionRegistry,
    loader: Box<dyn FeatureLoader>,
    wordsets: Box<dyn WordSetResolver>,
    cancel: CancellationToken,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Engine with built-in functions and no loader. Word sets come from
    /// `wordset_dir` when it is configured.
    pub fn with_config(config: EngineConfig) -> Self {
        let wordsets: Box<dyn WordSetResolver> = match &config.wordset_dir {
            Some(dir) => Box::new(DirectoryWordSets::new(dir)),
            None => Box::new(MemoryWordSets::new()),
        };
        Engine {
            config,
            functions: FunctionRegistry::with_builtins(),
            loader: Box::new(NoLoader),
            wordsets,
            cancel: CancellationToken::new(),
        }
    }

    pub fn from_config_file(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::with_config(EngineConfig::load(path)?))
    }

    pub fn with_loader(mut self, loader: impl FeatureLoader + 'static) -> Self {
        self.loader = Box::new(loader);
        self
    }

    pub fn with_wordsets(mut self, resolver: impl WordSetResolver + 'static) -> Self {
        self.wordsets = Box::new(resolver);
        self
    }

    pub fn with_functions(mut self, functions: FunctionRegistry) -> Self {
        self.functions = functions;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn functions_mut(&mut self) -> &mut FunctionRegistry {
        &mut self.functions
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Parses the whole batch, then runs its commands in order.
    ///
    /// A syntax error anywhere runs nothing. Otherwise the first failing
    /// command stops the batch; commands before it stay committed.
    pub fn run(&self, workspace: &mut Workspace, text: &str) -> Result<Vec<Outcome>> {
        let model = parse(text)?;
        debug!(commands = model.commands.len(), "parsed batch");
        let mut outcomes = Vec::with_capacity(model.commands.len());
        for (index, command) in model.commands.iter().enumerate() {
            match self.execute(workspace, command) {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    warn!(index, command = command.keyword(), error = %e, "command failed");
                    return Err(e);
                }
            }
        }
        Ok(outcomes)
    }

    /// Like [`Engine::run`], emitting each outcome as its command completes.
    /// Returns the number of commands executed.
    pub fn run_into(
        &self,
        workspace: &mut Workspace,
        text: &str,
        sink: &mut dyn OutputSink,
    ) -> Result<usize> {
        let model = parse(text)?;
        debug!(commands = model.commands.len(), "parsed batch");
        for (index, command) in model.commands.iter().enumerate() {
            let outcome = self.execute(workspace, command).inspect_err(|e| {
                warn!(index, command = command.keyword(), error = %e, "command failed");
            })?;
            sink.emit(&outcome)?;
        }
        Ok(model.commands.len())
    }

    pub fn execute(&self, workspace: &mut Workspace, command: &Command) -> Result<Outcome> {
        debug!(command = command.keyword(), "executing command");
        let plan = self.plan(workspace, command)?;
        if let Some(change) = plan.change {
            apply(workspace, change);
        }
        Ok(plan.outcome)
    }

    /// Executes one command on a shared workspace: read-only commands under
    /// a read lock, everything else under the write lock.
    pub fn execute_shared(&self, workspace: &SharedWorkspace, command: &Command) -> Result<Outcome> {
        if command.is_read_only() {
            let guard = workspace.read()?;
            debug!(command = command.keyword(), "executing read-only command");
            return Ok(self.plan(&guard, command)?.outcome);
        }
        let mut guard = workspace.write()?;
        self.execute(&mut guard, command)
    }

    pub fn run_shared(&self, workspace: &SharedWorkspace, text: &str) -> Result<Vec<Outcome>> {
        let model = parse(text)?;
        debug!(commands = model.commands.len(), "parsed batch");
        let mut outcomes = Vec::with_capacity(model.commands.len());
        for (index, command) in model.commands.iter().enumerate() {
            let outcome = self.execute_shared(workspace, command).inspect_err(|e| {
                warn!(index, command = command.keyword(), error = %e, "command failed");
            })?;
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    fn plan(&self, workspace: &Workspace, command: &Command) -> Result<Plan> {
        match command {
            Command::Select {
                fields,
                source,
                filter,
                group_by,
            } => {
                let source = source.as_deref().unwrap_or(&self.config.default_source);
                let table = self.select(workspace, fields, source, filter.as_ref(), group_by.as_ref())?;
                Ok(Plan::read(Outcome::Rows(table)))
            }
            Command::Create {
                target,
                source,
                filter,
                group_by,
            } => {
                let set = self.create(workspace, source, filter.as_ref(), group_by.as_ref())?;
                Ok(Plan::created(target, set))
            }
            Command::CreateSetOperation {
                target,
                first,
                op,
                second,
            } => {
                let set = self.set_operation(workspace, first, *op, second)?;
                Ok(Plan::created(target, set))
            }
            Command::CreateSetExpression { target, expression } => {
                let set = sets::evaluate(expression, workspace, &self.cancel)?;
                Ok(Plan::created(target, Arc::unwrap_or_clone(set)))
            }
            Command::CreateIntersect {
                target,
                source,
                path,
            } => {
                let set = self.intersect(workspace, source, path)?;
                Ok(Plan::created(target, set))
            }
            Command::Count { source, filters } => {
                let set = workspace.require(source)?;
                let matching = self.filter(&set, source, filters.as_ref(), &[], workspace)?;
                Ok(Plan::read(Outcome::Count(matching.len())))
            }
            Command::Drop { feature, name } => self.drop_binding(workspace, feature, name),
            Command::Show { feature, name } => {
                let table = self.show(workspace, feature, name.as_deref())?;
                Ok(Plan::read(Outcome::Show(table)))
            }
            Command::Import {
                feature,
                path,
                name,
            } => self.import(feature, path, name.as_deref()),
        }
    }

    /// Features of `set` matching `filter`, after checking that every plain
    /// field referenced by the command exists in the set.
    fn filter<'s>(
        &self,
        set: &'s FeatureSet,
        set_name: &str,
        filter: Option<&FilterExpression>,
        extra_fields: &[&FieldIdentifier],
        workspace: &Workspace,
    ) -> Result<Vec<&'s Feature>> {
        let mut referenced: Vec<&FieldIdentifier> = extra_fields.to_vec();
        if let Some(filter) = filter {
            referenced.extend(filter.terms().into_iter().map(|t| &t.field));
        }
        check_fields(set, set_name, &referenced)?;

        let compiled = match filter {
            Some(expr) => Some(CompiledFilter::compile(expr, &self.filter_context(workspace))?),
            None => None,
        };
        let mut matching = Vec::new();
        for feature in set.iter() {
            self.cancel.check()?;
            if compiled.as_ref().is_none_or(|f| f.matches(feature)) {
                matching.push(feature);
            }
        }
        Ok(matching)
    }

    fn filter_context<'a>(&'a self, workspace: &'a Workspace) -> FilterContext<'a> {
        FilterContext {
            functions: &self.functions,
            workspace,
            wordsets: self.wordsets.as_ref(),
            regex_size_limit: self.config.regex_size_limit,
        }
    }

    fn select(
        &self,
        workspace: &Workspace,
        fields: &[FieldIdentifier],
        source: &str,
        filter: Option<&FilterExpression>,
        group_by: Option<&GroupBy>,
    ) -> Result<Table> {
        let set = workspace.require(source)?;
        let mut referenced: Vec<&FieldIdentifier> = fields.iter().collect();
        if let Some(group_by) = group_by {
            referenced.extend(group_by.fields.iter());
        }
        let matching = self.filter(&set, source, filter, &referenced, workspace)?;
        let resolved = fields
            .iter()
            .map(|f| self.functions.resolve(f))
            .collect::<Result<Vec<_>>>()?;
        let mut columns: Vec<String> = fields.iter().map(ToString::to_string).collect();

        let Some(group_by) = group_by else {
            let mut table = Table::new(columns);
            for feature in matching {
                table.push_row(resolved.iter().map(|r| r.extract(feature)).collect());
            }
            return Ok(table);
        };

        columns.push(COUNT_FIELD.to_string());
        let mut table = Table::new(columns);
        for (_, members) in self.group(&matching, group_by)? {
            let Some(first) = members.first() else {
                continue;
            };
            let mut row: Vec<Value> = resolved.iter().map(|r| r.extract(first)).collect();
            row.push(Value::Integer(members.len() as i64));
            table.push_row(row);
        }
        Ok(table)
    }

    fn create(
        &self,
        workspace: &Workspace,
        source: &str,
        filter: Option<&FilterExpression>,
        group_by: Option<&GroupBy>,
    ) -> Result<FeatureSet> {
        let set = workspace.require(source)?;
        if filter.is_none() && group_by.is_none() {
            return Ok((*set).clone());
        }
        let group_fields: Vec<&FieldIdentifier> =
            group_by.map(|g| g.fields.iter().collect()).unwrap_or_default();
        let matching = self.filter(&set, source, filter, &group_fields, workspace)?;

        let Some(group_by) = group_by else {
            return Ok(FeatureSet {
                kind: SELECTION_KIND.to_string(),
                features: matching.into_iter().cloned().collect(),
                grouping: set.grouping.clone(),
            });
        };

        let keys: Vec<String> = group_by.fields.iter().map(ToString::to_string).collect();
        let features = self
            .group(&matching, group_by)?
            .into_iter()
            .map(|(key, members)| {
                let mut feature: Feature = keys.iter().cloned().zip(key).collect();
                feature.insert(COUNT_FIELD, members.len() as i64);
                feature
            })
            .collect();
        Ok(FeatureSet::grouped(features, keys))
    }

    /// Groups features by the key fields in order of first appearance,
    /// then drops groups failing `HAVING`.
    fn group<'s>(
        &self,
        features: &[&'s Feature],
        group_by: &GroupBy,
    ) -> Result<Vec<(Vec<Value>, Vec<&'s Feature>)>> {
        let keys = group_by
            .fields
            .iter()
            .map(|f| self.functions.resolve(f))
            .collect::<Result<Vec<ResolvedField>>>()?;

        let mut index: HashMap<Vec<Value>, usize> = HashMap::new();
        let mut groups: Vec<(Vec<Value>, Vec<&'s Feature>)> = Vec::new();
        for &feature in features {
            self.cancel.check()?;
            let key: Vec<Value> = keys.iter().map(|k| k.extract(feature)).collect();
            match index.get(&key) {
                Some(&i) => groups[i].1.push(feature),
                None => {
                    index.insert(key.clone(), groups.len());
                    groups.push((key, vec![feature]));
                }
            }
        }

        if let Some(having) = &group_by.having {
            groups.retain(|(_, members)| having.op.holds(members.len() as i64, having.value));
        }
        Ok(groups)
    }

    fn set_operation(
        &self,
        workspace: &Workspace,
        first: &str,
        op: SetOperator,
        second: &str,
    ) -> Result<FeatureSet> {
        let left = workspace.require(first)?;
        let right = workspace.require(second)?;
        sets::apply(op, &left, &right, &self.cancel)
    }

    /// Features of `source` whose position falls inside one of the loaded
    /// intervals on the same chromosome, bounds inclusive.
    fn intersect(&self, workspace: &Workspace, source: &str, path: &str) -> Result<FeatureSet> {
        let set = workspace.require(source)?;
        let fields = &self.config.interval;
        let chrom_field = FieldIdentifier::Field(fields.chrom.clone());
        let position_field = FieldIdentifier::Field(fields.position.clone());
        check_fields(&set, source, &[&chrom_field, &position_field])?;
        let records = self.load(path)?;

        let mut intervals: HashMap<String, Vec<(i64, i64)>> = HashMap::new();
        for (i, record) in records.iter().enumerate() {
            let chrom = record.get(&fields.record_chrom).filter(|v| !v.is_null());
            let start = record.get(&fields.start).and_then(as_coordinate);
            let end = record.get(&fields.end).and_then(as_coordinate);
            let (Some(chrom), Some(start), Some(end)) = (chrom, start, end) else {
                return Err(VqlError::TypeMismatch(format!(
                    "record {} of '{}' needs '{}', '{}' and '{}' fields",
                    i, path, fields.record_chrom, fields.start, fields.end
                )));
            };
            intervals
                .entry(chrom.as_text())
                .or_default()
                .push((start, end));
        }
        debug!(path, intervals = records.len(), "loaded intervals");

        let mut features = Vec::new();
        for feature in set.iter() {
            self.cancel.check()?;
            let chrom = feature.get(&fields.chrom).map(Value::as_text);
            let pos = feature.get(&fields.position).and_then(as_coordinate);
            let (Some(chrom), Some(pos)) = (chrom, pos) else {
                continue;
            };
            let overlaps = intervals
                .get(&chrom)
                .is_some_and(|list| list.iter().any(|&(start, end)| start <= pos && pos <= end));
            if overlaps {
                features.push(feature.clone());
            }
        }
        Ok(FeatureSet::selection(features))
    }

    fn drop_binding(&self, workspace: &Workspace, feature: &str, name: &str) -> Result<Plan> {
        let change = if is_wordset_kind(feature) {
            if workspace.wordset(name).is_none() {
                return Err(VqlError::UnknownWordSet(name.to_string()));
            }
            Change::DropWords {
                name: name.to_string(),
            }
        } else {
            workspace.require(name)?;
            Change::DropSet {
                name: name.to_string(),
            }
        };
        Ok(Plan {
            outcome: Outcome::Dropped {
                feature: feature.to_string(),
                name: name.to_string(),
            },
            change: Some(change),
        })
    }

    fn show(&self, workspace: &Workspace, feature: &str, name: Option<&str>) -> Result<Table> {
        if is_wordset_kind(feature) {
            return match name {
                Some(name) => {
                    let words = workspace
                        .wordset(name)
                        .ok_or_else(|| VqlError::UnknownWordSet(name.to_string()))?;
                    let mut table = Table::new(vec!["word".to_string()]);
                    for word in words.iter() {
                        table.push_row(vec![Value::String(word.clone())]);
                    }
                    Ok(table)
                }
                None => {
                    let mut table = Table::new(vec!["name".to_string(), "count".to_string()]);
                    for name in workspace.wordset_names() {
                        let count = workspace.wordset(&name).map_or(0, |w| w.len());
                        table.push_row(vec![Value::String(name), Value::Integer(count as i64)]);
                    }
                    Ok(table)
                }
            };
        }

        match name {
            Some(name) => {
                let set = workspace.require(name)?;
                Ok(Table::from_set(&set, self.config.show_limit))
            }
            None if !is_listing_kind(feature) && workspace.contains(feature) => {
                let set = workspace.require(feature)?;
                Ok(Table::from_set(&set, self.config.show_limit))
            }
            None => {
                let all = is_listing_kind(feature);
                let mut table = Table::new(vec![
                    "name".to_string(),
                    "kind".to_string(),
                    COUNT_FIELD.to_string(),
                ]);
                for name in workspace.names() {
                    let Some(set) = workspace.get(&name) else {
                        continue;
                    };
                    if all || set.kind == feature {
                        table.push_row(vec![
                            Value::String(name),
                            Value::String(set.kind.clone()),
                            Value::Integer(set.len() as i64),
                        ]);
                    }
                }
                // Neither a set name nor the kind of any set
                if !all && table.is_empty() {
                    return Err(VqlError::UnknownSet(feature.to_string()));
                }
                Ok(table)
            }
        }
    }

    fn import(&self, feature: &str, path: &str, name: Option<&str>) -> Result<Plan> {
        let name = match name {
            Some(name) => name.to_string(),
            None => default_name(path),
        };
        let records = self.load(path)?;

        if is_wordset_kind(feature) {
            let words: WordSet = records
                .iter()
                .filter_map(|r| r.fields().next().map(|(_, v)| v))
                .filter(|v| !v.is_null())
                .map(Value::as_text)
                .collect();
            return Ok(Plan {
                outcome: Outcome::Imported {
                    feature: feature.to_string(),
                    name: name.clone(),
                    count: words.len(),
                },
                change: Some(Change::BindWords { name, words }),
            });
        }

        let set = FeatureSet::new(feature, records);
        Ok(Plan {
            outcome: Outcome::Imported {
                feature: feature.to_string(),
                name: name.clone(),
                count: set.len(),
            },
            change: Some(Change::BindSet { name, set }),
        })
    }

    fn load(&self, path: &str) -> Result<Vec<Feature>> {
        self.loader.load(path).map_err(|source| VqlError::Io {
            path: path.to_string(),
            source,
        })
    }
}

fn apply(workspace: &mut Workspace, change: Change) {
    match change {
        Change::BindSet { name, set } => {
            let count = set.len();
            let replaced = workspace.bind(name.clone(), set).is_some();
            info!(name = %name, count, replaced, "bound set");
        }
        Change::DropSet { name } => {
            workspace.remove(&name);
            info!(name = %name, "dropped set");
        }
        Change::BindWords { name, words } => {
            let count = words.len();
            let replaced = workspace.bind_wordset(name.clone(), words).is_some();
            info!(name = %name, count, replaced, "bound word set");
        }
        Change::DropWords { name } => {
            workspace.remove_wordset(&name);
            info!(name = %name, "dropped word set");
        }
    }
}

/// A plain field is unknown when the set has features and none carries it.
fn check_fields(set: &FeatureSet, set_name: &str, fields: &[&FieldIdentifier]) -> Result<()> {
    if set.is_empty() {
        return Ok(());
    }
    for field in fields {
        if let FieldIdentifier::Field(name) = field
            && !set.has_field(name)
        {
            return Err(VqlError::UnknownField {
                field: name.clone(),
                set: set_name.to_string(),
            });
        }
    }
    Ok(())
}

fn as_coordinate(value: &Value) -> Option<i64> {
    match value {
        Value::Integer(n) => Some(*n),
        Value::Float(f) if f.fract() == 0.0 => Some(*f as i64),
        _ => None,
    }
}

/// Binding name of an `IMPORT` without `AS`: the file stem of the path.
fn default_name(path: &str) -> String {
    Path::new(path)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_name_uses_file_stem() {
        assert_eq!(default_name("/data/x.bed"), "x");
        assert_eq!(default_name("genes.txt"), "genes");
        assert_eq!(default_name("panel"), "panel");
    }

    #[test]
    fn test_cancellation_token_is_shared() {
        let token = CancellationToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
        assert!(matches!(token.check(), Err(VqlError::Cancelled)));
        token.reset();
        assert!(clone.check().is_ok());
    }
}
