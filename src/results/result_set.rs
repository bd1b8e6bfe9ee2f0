use std::sync::{Arc, Weak};

use crate::driver::DriverResult;
use crate::error::{DriverError, SqlOffloadError};

use super::field::FieldInfo;
use super::row::{Row, build_column_index};

/// Liveness marker for the results of one fetch on a connection.
///
/// The connection owns the only strong reference; storing the next result or
/// closing the connection drops it and expires every [`ResultSet`] built
/// against it.
#[derive(Debug)]
pub(crate) struct ResultAnchor;

/// Materialized outcome of `store_result`.
///
/// Rows are copied out eagerly, but the set stays tied to the connection it
/// came from: once that connection stores another result or closes, the set
/// reports [`ResultSet::expired`], [`ResultSet::size`] drops to zero and
/// iteration yields nothing. Clones share rows and fields.
#[derive(Debug, Clone)]
pub struct ResultSet {
    row_count: u64,
    affected_rows: u64,
    field_count: u32,
    fields: Arc<Vec<FieldInfo>>,
    rows: Arc<Vec<Row>>,
    owner: Option<Weak<ResultAnchor>>,
}

impl ResultSet {
    /// A detached empty set that never expires.
    #[must_use]
    pub fn empty_set() -> Self {
        Self {
            row_count: 0,
            affected_rows: 0,
            field_count: 0,
            fields: Arc::new(Vec::new()),
            rows: Arc::new(Vec::new()),
            owner: None,
        }
    }

    /// Outcome of a statement that produced no result handle.
    pub(crate) fn without_rows(affected_rows: u64, owner: Weak<ResultAnchor>) -> Self {
        Self {
            affected_rows,
            owner: Some(owner),
            ..Self::empty_set()
        }
    }

    /// Copy fields and rows out of a native result.
    ///
    /// Field metadata is read even when the result has no rows. A failed row
    /// fetch discards everything read so far.
    pub(crate) fn materialize<R: DriverResult>(
        native: &mut R,
        owner: Weak<ResultAnchor>,
    ) -> Result<Self, DriverError> {
        let reported_rows = native.num_rows();
        let fields = Arc::new(native.fields());
        let field_count = u32::try_from(fields.len()).unwrap_or(u32::MAX);
        let column_index = build_column_index(&fields);

        let mut rows = Vec::with_capacity(usize::try_from(reported_rows).unwrap_or(0));
        while let Some(values) = native.fetch_row()? {
            rows.push(Row::new(Arc::clone(&fields), values, Arc::clone(&column_index)));
        }

        Ok(Self {
            row_count: rows.len() as u64,
            affected_rows: 0,
            field_count,
            fields,
            rows: Arc::new(rows),
            owner: Some(owner),
        })
    }

    pub(crate) fn set_affected_rows(&mut self, affected_rows: u64) {
        self.affected_rows = affected_rows;
    }

    fn is_live(&self) -> bool {
        self.owner
            .as_ref()
            .is_none_or(|owner| owner.strong_count() > 0)
    }

    /// True once the owning connection stored a newer result or closed.
    #[must_use]
    pub fn expired(&self) -> bool {
        !self.is_live()
    }

    /// Number of rows, zero once expired.
    #[must_use]
    pub fn size(&self) -> u64 {
        if self.is_live() { self.row_count } else { 0 }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    #[must_use]
    pub fn field_count(&self) -> u32 {
        if self.is_live() { self.field_count } else { 0 }
    }

    #[must_use]
    pub fn affected_rows(&self) -> u64 {
        self.affected_rows
    }

    #[must_use]
    pub fn fields(&self) -> &[FieldInfo] {
        if self.is_live() { &self.fields } else { &[] }
    }

    fn live_rows(&self) -> &[Row] {
        if self.is_live() { &self.rows } else { &[] }
    }

    /// Rows in server order; supports `.rev()`.
    pub fn iter(&self) -> std::slice::Iter<'_, Row> {
        self.live_rows().iter()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Row> {
        self.live_rows().get(index)
    }

    /// # Errors
    /// [`SqlOffloadError::UsageError`] when the set expired or `index` is out of range.
    pub fn at(&self, index: usize) -> Result<&Row, SqlOffloadError> {
        if !self.is_live() {
            return Err(SqlOffloadError::usage("result set expired"));
        }
        self.rows.get(index).ok_or_else(|| {
            SqlOffloadError::usage(format!(
                "row index {index} out of range for {} rows",
                self.row_count
            ))
        })
    }
}

impl Default for ResultSet {
    fn default() -> Self {
        Self::empty_set()
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
