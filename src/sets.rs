//! Set algebra over feature sets.
//!
//! Membership is structural: two features are the same member when they
//! carry the same fields with identical values, whatever the field order.
//! Every operation keeps the left operand's order; union then appends the
//! right operand's features that are not yet present.

use std::collections::HashSet;
use std::sync::Arc;

use crate::{
    ast::{SetExpression, SetOperand, SetOperator},
    error::{Result, VqlError},
    executor::CancellationToken,
    value::{Feature, FeatureSet},
    workspace::Workspace,
};

pub fn union(left: &FeatureSet, right: &FeatureSet, cancel: &CancellationToken) -> Result<FeatureSet> {
    check_compatible(left, right, SetOperator::Union)?;
    let mut seen: HashSet<&Feature> = left.iter().collect();
    let mut features = left.features.clone();
    for feature in right.iter() {
        cancel.check()?;
        if seen.insert(feature) {
            features.push(feature.clone());
        }
    }
    Ok(derived(left, features))
}

pub fn difference(
    left: &FeatureSet,
    right: &FeatureSet,
    cancel: &CancellationToken,
) -> Result<FeatureSet> {
    check_compatible(left, right, SetOperator::Difference)?;
    let exclude: HashSet<&Feature> = right.iter().collect();
    let features = retain(left, cancel, |f| !exclude.contains(f))?;
    Ok(derived(left, features))
}

pub fn intersection(
    left: &FeatureSet,
    right: &FeatureSet,
    cancel: &CancellationToken,
) -> Result<FeatureSet> {
    check_compatible(left, right, SetOperator::Intersection)?;
    let keep: HashSet<&Feature> = right.iter().collect();
    let features = retain(left, cancel, |f| keep.contains(f))?;
    Ok(derived(left, features))
}

pub fn apply(
    op: SetOperator,
    left: &FeatureSet,
    right: &FeatureSet,
    cancel: &CancellationToken,
) -> Result<FeatureSet> {
    match op {
        SetOperator::Union => union(left, right, cancel),
        SetOperator::Difference => difference(left, right, cancel),
        SetOperator::Intersection => intersection(left, right, cancel),
    }
}

/// Folds `(((a op b) op c) ...)` strictly left to right.
pub fn evaluate(
    expr: &SetExpression,
    workspace: &Workspace,
    cancel: &CancellationToken,
) -> Result<Arc<FeatureSet>> {
    // Every name must resolve before any work is done.
    for name in expr.names() {
        workspace.require(name)?;
    }
    fold(expr, workspace, cancel)
}

fn fold(
    expr: &SetExpression,
    workspace: &Workspace,
    cancel: &CancellationToken,
) -> Result<Arc<FeatureSet>> {
    let mut acc = operand(&expr.first, workspace, cancel)?;
    for (op, next) in &expr.rest {
        let right = operand(next, workspace, cancel)?;
        acc = Arc::new(apply(*op, &acc, &right, cancel)?);
    }
    Ok(acc)
}

fn operand(
    operand: &SetOperand,
    workspace: &Workspace,
    cancel: &CancellationToken,
) -> Result<Arc<FeatureSet>> {
    match operand {
        SetOperand::Name(name) => workspace.require(name),
        SetOperand::Group(expr) => fold(expr, workspace, cancel),
    }
}

fn retain(
    set: &FeatureSet,
    cancel: &CancellationToken,
    mut keep: impl FnMut(&Feature) -> bool,
) -> Result<Vec<Feature>> {
    let mut out = Vec::new();
    for feature in set.iter() {
        cancel.check()?;
        if keep(feature) {
            out.push(feature.clone());
        }
    }
    Ok(out)
}

fn check_compatible(left: &FeatureSet, right: &FeatureSet, op: SetOperator) -> Result<()> {
    if left.grouping.is_some() != right.grouping.is_some() {
        return Err(VqlError::TypeMismatch(format!(
            "operator '{}' cannot combine a grouped set with an ungrouped one",
            op
        )));
    }
    Ok(())
}

fn derived(left: &FeatureSet, features: Vec<Feature>) -> FeatureSet {
    match &left.grouping {
        Some(grouping) => FeatureSet::grouped(features, grouping.keys.clone()),
        None => FeatureSet::selection(features),
    }
}
