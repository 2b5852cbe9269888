//! Declarative constraint checks over bound records.
//!
//! A record's own fields are all checked, in declaration order, before any of
//! its nested records is entered. Nested records are then validated in field
//! order, each one completely before the next. The first violation wins.

use crate::constraints::Constraints;
use crate::error::ToolError;
use crate::record::{FieldView, RecordView, ToolRecord};

/// Validates `record` against the constraints in its descriptor table.
///
/// # Errors
///
/// Returns [`ToolError::Validation`] naming the dotted path of the first field
/// that violates a constraint.
pub fn validate<T: ToolRecord>(record: &T) -> Result<(), ToolError> {
    validate_record(record, "")
}

fn validate_record(record: &dyn RecordView, prefix: &str) -> Result<(), ToolError> {
    let descriptors = record.descriptors();
    let values = record.field_values();

    for (descriptor, value) in descriptors.iter().zip(&values) {
        let path = join(prefix, descriptor.name());
        check_field(&path, descriptor.constraints(), &value.view())?;
    }

    for (descriptor, value) in descriptors.iter().zip(&values) {
        let path = join(prefix, descriptor.name());
        descend(&path, &value.view())?;
    }

    Ok(())
}

fn descend(path: &str, view: &FieldView<'_>) -> Result<(), ToolError> {
    match view {
        FieldView::Record(record) => validate_record(*record, path),
        FieldView::Sequence(items) => items
            .iter()
            .enumerate()
            .try_for_each(|(index, item)| descend(&format!("{path}[{index}]"), &item.view())),
        FieldView::Map(entries) => entries
            .iter()
            .try_for_each(|(key, item)| descend(&join(path, key), &item.view())),
        _ => Ok(()),
    }
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_owned()
    } else {
        format!("{prefix}.{name}")
    }
}

fn check_field(path: &str, constraints: &Constraints, view: &FieldView<'_>) -> Result<(), ToolError> {
    if constraints.is_required() && view.is_zero() {
        return Err(ToolError::invalid_input(path, "is required"));
    }

    match view {
        FieldView::Text(text) => check_text(path, constraints, text),
        FieldView::Number(number) => check_number(path, constraints, *number),
        FieldView::Sequence(items) => check_count(path, constraints, items.len()),
        FieldView::Map(entries) => check_count(path, constraints, entries.len()),
        _ => Ok(()),
    }
}

fn check_text(path: &str, constraints: &Constraints, text: &str) -> Result<(), ToolError> {
    let length = text.chars().count();
    if let Some(min) = constraints.min_length() {
        if length < min {
            return Err(ToolError::invalid_input(
                path,
                format!("must be at least {min} characters"),
            ));
        }
    }
    if let Some(max) = constraints.max_length() {
        if length > max {
            return Err(ToolError::invalid_input(
                path,
                format!("must be at most {max} characters"),
            ));
        }
    }
    if let (Some(regex), Some(source)) = (constraints.compiled_pattern(), constraints.pattern()) {
        if !regex.is_match(text) {
            return Err(ToolError::invalid_input(
                path,
                format!("must match pattern {source}"),
            ));
        }
    }
    let allowed = constraints.enum_values();
    if !allowed.is_empty() && !allowed.iter().any(|value| value == text) {
        return Err(ToolError::invalid_input(
            path,
            format!("must be one of: {}", allowed.join(", ")),
        ));
    }
    Ok(())
}

fn check_number(path: &str, constraints: &Constraints, number: f64) -> Result<(), ToolError> {
    if let Some(min) = constraints.minimum() {
        if min.as_f64().is_some_and(|bound| number < bound) {
            return Err(ToolError::invalid_input(path, format!("must be >= {min}")));
        }
    }
    if let Some(max) = constraints.maximum() {
        if max.as_f64().is_some_and(|bound| number > bound) {
            return Err(ToolError::invalid_input(path, format!("must be <= {max}")));
        }
    }
    Ok(())
}

fn check_count(path: &str, constraints: &Constraints, count: usize) -> Result<(), ToolError> {
    if let Some(min) = constraints.min_items() {
        if count < min {
            return Err(ToolError::invalid_input(
                path,
                format!("must contain at least {min} items"),
            ));
        }
    }
    if let Some(max) = constraints.max_items() {
        if count > max {
            return Err(ToolError::invalid_input(
                path,
                format!("must contain at most {max} items"),
            ));
        }
    }
    Ok(())
}
