use std::collections::VecDeque;

use rusqlite::types::ValueRef;
use rusqlite::{Column, Statement};

use crate::driver::{DriverResult, RawRow};
use crate::error::DriverError;
use crate::results::{FieldInfo, FieldType};

/// Rows of one SQLite statement, buffered when the statement ran.
#[derive(Debug, Default)]
pub struct SqliteResult {
    fields: Vec<FieldInfo>,
    rows: VecDeque<RawRow>,
}

impl SqliteResult {
    /// Step `stmt` to completion, copying every row in its text representation.
    pub(crate) fn collect(stmt: &mut Statement<'_>) -> Result<Self, DriverError> {
        let mut fields: Vec<FieldInfo> = stmt.columns().iter().map(field_from_column).collect();
        let column_count = fields.len();

        let mut rows = VecDeque::new();
        let mut cursor = stmt.query([])?;
        while let Some(row) = cursor.next()? {
            let mut values = Vec::with_capacity(column_count);
            for idx in 0..column_count {
                let value = row.get_ref(idx)?;
                // Undeclared columns take the type of their first non-NULL value.
                if matches!(fields[idx].field_type, FieldType::Unknown | FieldType::Null) {
                    fields[idx].field_type = type_of_value(value);
                }
                values.push(value_bytes(value));
            }
            rows.push_back(values);
        }
        Ok(Self { fields, rows })
    }

    #[must_use]
    pub fn column_count(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.rows.len()
    }
}

impl DriverResult for SqliteResult {
    fn num_rows(&self) -> u64 {
        self.rows.len() as u64
    }

    fn fields(&mut self) -> Vec<FieldInfo> {
        self.fields.clone()
    }

    fn fetch_row(&mut self) -> Result<Option<RawRow>, DriverError> {
        Ok(self.rows.pop_front())
    }
}

fn field_from_column(column: &Column<'_>) -> FieldInfo {
    let decl = column.decl_type().unwrap_or_default();
    FieldInfo::new(column.name(), affinity(decl)).with_type_name(decl)
}

/// Column type from the declared type, following SQLite's affinity rules.
fn affinity(decl: &str) -> FieldType {
    let decl = decl.to_ascii_uppercase();
    if decl.is_empty() {
        FieldType::Unknown
    } else if decl.contains("INT") {
        FieldType::Integer
    } else if decl.contains("CHAR") || decl.contains("CLOB") || decl.contains("TEXT") {
        FieldType::Text
    } else if decl.contains("BLOB") {
        FieldType::Blob
    } else if decl.contains("REAL") || decl.contains("FLOA") || decl.contains("DOUB") {
        FieldType::Float
    } else if decl.contains("DATE") || decl.contains("TIME") {
        FieldType::Temporal
    } else {
        FieldType::Decimal
    }
}

fn type_of_value(value: ValueRef<'_>) -> FieldType {
    match value {
        ValueRef::Null => FieldType::Null,
        ValueRef::Integer(_) => FieldType::Integer,
        ValueRef::Real(_) => FieldType::Float,
        ValueRef::Text(_) => FieldType::Text,
        ValueRef::Blob(_) => FieldType::Blob,
    }
}

fn value_bytes(value: ValueRef<'_>) -> Option<Vec<u8>> {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(i) => Some(i.to_string().into_bytes()),
        ValueRef::Real(f) => Some(f.to_string().into_bytes()),
        ValueRef::Text(text) | ValueRef::Blob(text) => Some(text.to_vec()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declared_types_map_to_field_types() {
        assert_eq!(affinity("INTEGER"), FieldType::Integer);
        assert_eq!(affinity("varchar(32)"), FieldType::Text);
        assert_eq!(affinity("DOUBLE PRECISION"), FieldType::Float);
        assert_eq!(affinity("DATETIME"), FieldType::Temporal);
        assert_eq!(affinity("NUMERIC(10,2)"), FieldType::Decimal);
        assert_eq!(affinity(""), FieldType::Unknown);
    }

    #[test]
    fn collect_buffers_rows_as_text() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let mut stmt = conn
            .prepare("SELECT 7 AS n, 2.5 AS f, 'x' AS t, NULL AS z")
            .unwrap();
        let mut result = SqliteResult::collect(&mut stmt).unwrap();

        assert_eq!(result.num_rows(), 1);
        let fields = result.fields();
        assert_eq!(fields[0].name, "n");
        assert_eq!(fields[0].field_type, FieldType::Integer);
        assert_eq!(fields[1].field_type, FieldType::Float);
        assert_eq!(fields[3].field_type, FieldType::Null);

        let row = result.fetch_row().unwrap().unwrap();
        assert_eq!(row[0].as_deref(), Some(&b"7"[..]));
        assert_eq!(row[1].as_deref(), Some(&b"2.5"[..]));
        assert_eq!(row[2].as_deref(), Some(&b"x"[..]));
        assert_eq!(row[3], None);
        assert!(result.fetch_row().unwrap().is_none());
    }
}
