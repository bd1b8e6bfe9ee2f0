use std::collections::HashMap;
use std::sync::Arc;

use crate::driver::RawRow;
use crate::error::SqlOffloadError;

use super::field::FieldInfo;
use super::value::FromField;

pub(crate) type ColumnIndex = Arc<HashMap<String, usize>>;

pub(crate) fn build_column_index(fields: &[FieldInfo]) -> ColumnIndex {
    let mut index = HashMap::with_capacity(fields.len());
    for (i, field) in fields.iter().enumerate() {
        // First occurrence wins for duplicate column names.
        index.entry(field.name.clone()).or_insert(i);
    }
    Arc::new(index)
}

/// A row copied out of the driver's buffer.
///
/// Field descriptors and the name lookup table are shared with every other row
/// of the same result set.
#[derive(Debug, Clone)]
pub struct Row {
    fields: Arc<Vec<FieldInfo>>,
    values: RawRow,
    column_index: ColumnIndex,
}

impl Row {
    pub(crate) fn new(fields: Arc<Vec<FieldInfo>>, values: RawRow, column_index: ColumnIndex) -> Self {
        Self {
            fields,
            values,
            column_index,
        }
    }

    /// A standalone row with its own field list and lookup table.
    #[cfg(any(test, feature = "test-utils"))]
    pub(crate) fn standalone(fields: Vec<FieldInfo>, values: RawRow) -> Self {
        let column_index = build_column_index(&fields);
        Self::new(Arc::new(fields), values, column_index)
    }

    /// Number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[must_use]
    pub fn fields(&self) -> &[FieldInfo] {
        &self.fields
    }

    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.column_index.get(name).copied()
    }

    /// Raw bytes of column `idx`; `None` for SQL NULL or an out-of-range index.
    #[must_use]
    pub fn raw(&self, idx: usize) -> Option<&[u8]> {
        self.values.get(idx).and_then(|value| value.as_deref())
    }

    /// Byte length of column `idx`, zero for NULL.
    #[must_use]
    pub fn length(&self, idx: usize) -> usize {
        self.raw(idx).map_or(0, <[u8]>::len)
    }

    #[must_use]
    pub fn is_null(&self, idx: usize) -> bool {
        matches!(self.values.get(idx), Some(None))
    }

    /// Decode column `idx`.
    ///
    /// # Errors
    /// [`SqlOffloadError::UsageError`] for an out-of-range index, otherwise the decoder's error.
    pub fn get<T: FromField>(&self, idx: usize) -> Result<T, SqlOffloadError> {
        let (Some(value), Some(field)) = (self.values.get(idx), self.fields.get(idx)) else {
            return Err(SqlOffloadError::usage(format!(
                "column index {idx} out of range for row of {} columns",
                self.values.len()
            )));
        };
        T::from_field(value.as_deref(), field)
    }

    /// Decode the column called `name`.
    ///
    /// # Errors
    /// [`SqlOffloadError::UsageError`] for an unknown column, otherwise the decoder's error.
    pub fn get_by_name<T: FromField>(&self, name: &str) -> Result<T, SqlOffloadError> {
        let idx = self
            .column_index(name)
            .ok_or_else(|| SqlOffloadError::usage(format!("no column named '{name}'")))?;
        self.get(idx)
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<&[u8]>> {
        self.values.iter().map(|value| value.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use crate::error::SqlOffloadError;
    use crate::test_utils::create_test_row;

    #[test]
    fn lookup_by_index_and_name() {
        let row = create_test_row(&["id", "name", "id"], &[Some("7"), None, Some("8")]);
        assert_eq!(row.len(), 3);
        assert_eq!(row.get::<i64>(0).unwrap(), 7);
        // Duplicate names resolve to the first column.
        assert_eq!(row.get_by_name::<i64>("id").unwrap(), 7);
        assert!(row.is_null(1));
        assert_eq!(row.length(0), 1);
        assert_eq!(row.length(1), 0);
        assert_eq!(row.iter().filter(Option::is_none).count(), 1);
    }

    #[test]
    fn out_of_range_and_unknown_columns_are_usage_errors() {
        let row = create_test_row(&["id"], &[Some("1")]);
        assert!(matches!(row.get::<i64>(5), Err(SqlOffloadError::UsageError(_))));
        assert!(matches!(
            row.get_by_name::<i64>("missing"),
            Err(SqlOffloadError::UsageError(_))
        ));
        assert_eq!(row.raw(5), None);
    }
}
