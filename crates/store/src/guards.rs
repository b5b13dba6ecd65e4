//! Cheap checks run before a query is built.

use indexer_common_types::QueryableField;
use serde::Serialize;

use crate::error::{StoreError, StoreResult};

/// Fails with the first of `required` that `filter` doesn't set. A field
/// counts as set when it serializes to anything but `null`, so `0`, `""` and
/// `false` all satisfy the check.
pub fn verify_all_required_fields(
    filter: &impl Serialize,
    required: &[QueryableField],
) -> StoreResult<()> {
    if required.is_empty() {
        return Ok(());
    }

    let value = serde_json::to_value(filter)?;
    let present = value.as_object();

    for field in required {
        let is_set = present
            .and_then(|fields| fields.get(field.as_ref()))
            .is_some_and(|v| !v.is_null());
        if !is_set {
            return Err(StoreError::RequiredFieldMissing(*field));
        }
    }

    Ok(())
}

/// Rejects values that contain whitespace before they are spliced into raw
/// SQL. Absent values pass. This is a heuristic for identifiers and numbers
/// rendered as text, not a sanitizer; bind parameters wherever possible.
pub fn verify_all_injectable_variables<S: AsRef<str>>(values: &[Option<S>]) -> StoreResult<()> {
    for value in values.iter().flatten() {
        let value = value.as_ref();
        if value.chars().any(char::is_whitespace) {
            return Err(StoreError::InjectionRejected(value.to_owned()));
        }
    }
    Ok(())
}
