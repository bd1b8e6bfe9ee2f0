//! Helper utilities for testing and development.

use crate::driver::RawRow;
use crate::results::{FieldInfo, FieldType, Row};

/// Text-typed field descriptors for the given column names.
#[must_use]
pub fn text_fields(names: &[&str]) -> Vec<FieldInfo> {
    names
        .iter()
        .map(|name| FieldInfo::new(*name, FieldType::Text))
        .collect()
}

/// Raw row values from optional string slices; `None` is SQL NULL.
#[must_use]
pub fn raw_row(values: &[Option<&str>]) -> RawRow {
    values
        .iter()
        .map(|value| value.map(|text| text.as_bytes().to_vec()))
        .collect()
}

/// Create a test row with the given column names and values.
#[must_use]
pub fn create_test_row(names: &[&str], values: &[Option<&str>]) -> Row {
    Row::standalone(text_fields(names), raw_row(values))
}
