use std::fmt;

use crate::ast::{FieldIdentifier, FilterExpression, HavingOperator, SetExpression, SetOperator};
use crate::value::quote;

/// `GROUP BY` clause with its optional `HAVING count <op> <n>` restriction.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupBy {
    pub fields: Vec<FieldIdentifier>,
    pub having: Option<Having>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Having {
    pub op: HavingOperator,
    pub value: i64,
}

/// One parsed command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Projection over a set
    ///
    /// # Example
    /// ```text
    /// SELECT chr, pos FROM variants WHERE pos > 10 GROUP BY chr HAVING count > 2
    /// ```
    Select {
        fields: Vec<FieldIdentifier>,
        source: Option<String>,
        filter: Option<FilterExpression>,
        group_by: Option<GroupBy>,
    },

    /// Filtered (or plain) copy of a set
    ///
    /// # Examples
    /// ```text
    /// CREATE high FROM variants WHERE score >= 10
    /// CREATE backup FROM variants
    /// ```
    Create {
        target: String,
        source: String,
        filter: Option<FilterExpression>,
        group_by: Option<GroupBy>,
    },

    /// Single binary set operation
    ///
    /// # Example
    /// ```text
    /// CREATE u = a | b
    /// ```
    CreateSetOperation {
        target: String,
        first: String,
        op: SetOperator,
        second: String,
    },

    /// Full set expression
    ///
    /// # Example
    /// ```text
    /// CREATE u = (a | b) - c
    /// ```
    CreateSetExpression {
        target: String,
        expression: SetExpression,
    },

    /// Intersection with an external interval file
    ///
    /// # Example
    /// ```text
    /// CREATE y FROM variants INTERSECT "/data/x.bed"
    /// ```
    CreateIntersect {
        target: String,
        source: String,
        path: String,
    },

    /// # Example
    /// ```text
    /// COUNT FROM variants WHERE chr = 'chr1'
    /// ```
    Count {
        source: String,
        filters: Option<FilterExpression>,
    },

    /// # Examples
    /// ```text
    /// DROP selections high
    /// DROP wordsets panel
    /// ```
    Drop { feature: String, name: String },

    /// # Examples
    /// ```text
    /// SHOW selections
    /// SHOW feature high
    /// ```
    Show { feature: String, name: Option<String> },

    /// # Example
    /// ```text
    /// IMPORT feature "/data/x.bed" AS x
    /// ```
    Import {
        feature: String,
        path: String,
        name: Option<String>,
    },
}

impl Command {
    /// Commands that never mutate the workspace.
    pub fn is_read_only(&self) -> bool {
        matches!(
            self,
            Command::Select { .. } | Command::Count { .. } | Command::Show { .. }
        )
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            Command::Select { .. } => "SELECT",
            Command::Create { .. }
            | Command::CreateSetOperation { .. }
            | Command::CreateSetExpression { .. }
            | Command::CreateIntersect { .. } => "CREATE",
            Command::Count { .. } => "COUNT",
            Command::Drop { .. } => "DROP",
            Command::Show { .. } => "SHOW",
            Command::Import { .. } => "IMPORT",
        }
    }
}

fn write_fields(f: &mut fmt::Formatter<'_>, fields: &[FieldIdentifier]) -> fmt::Result {
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", field)?;
    }
    Ok(())
}

impl fmt::Display for GroupBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("GROUP BY ")?;
        write_fields(f, &self.fields)?;
        if let Some(having) = &self.having {
            write!(f, " HAVING count {} {}", having.op, having.value)?;
        }
        Ok(())
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Select {
                fields,
                source,
                filter,
                group_by,
            } => {
                f.write_str("SELECT ")?;
                write_fields(f, fields)?;
                if let Some(source) = source {
                    write!(f, " FROM {}", source)?;
                }
                if let Some(filter) = filter {
                    write!(f, " WHERE {}", filter)?;
                }
                if let Some(group_by) = group_by {
                    write!(f, " {}", group_by)?;
                }
                Ok(())
            }
            Command::Create {
                target,
                source,
                filter,
                group_by,
            } => {
                write!(f, "CREATE {} FROM {}", target, source)?;
                if let Some(filter) = filter {
                    write!(f, " WHERE {}", filter)?;
                }
                if let Some(group_by) = group_by {
                    write!(f, " {}", group_by)?;
                }
                Ok(())
            }
            Command::CreateSetOperation {
                target,
                first,
                op,
                second,
            } => write!(f, "CREATE {} = {} {} {}", target, first, op, second),
            Command::CreateSetExpression { target, expression } => {
                write!(f, "CREATE {} = {}", target, expression)
            }
            Command::CreateIntersect {
                target,
                source,
                path,
            } => write!(f, "CREATE {} FROM {} INTERSECT {}", target, source, quote(path)),
            Command::Count { source, filters } => {
                write!(f, "COUNT FROM {}", source)?;
                if let Some(filters) = filters {
                    write!(f, " WHERE {}", filters)?;
                }
                Ok(())
            }
            Command::Drop { feature, name } => write!(f, "DROP {} {}", feature, name),
            Command::Show { feature, name } => match name {
                Some(name) => write!(f, "SHOW {} {}", feature, name),
                None => write!(f, "SHOW {}", feature),
            },
            Command::Import {
                feature,
                path,
                name,
            } => {
                write!(f, "IMPORT {} {}", feature, quote(path))?;
                if let Some(name) = name {
                    write!(f, " AS {}", name)?;
                }
                Ok(())
            }
        }
    }
}

/// A parsed batch of commands, kept in source order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Model {
    pub commands: Vec<Command>,
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for command in &self.commands {
            writeln!(f, "{};", command)?;
        }
        Ok(())
    }
}
