/// Broad column type as reported by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FieldType {
    Null,
    Integer,
    Float,
    Decimal,
    Text,
    Blob,
    Temporal,
    #[default]
    Unknown,
}

/// Column descriptor shared by every row of a result set.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FieldInfo {
    /// Column name or alias as seen by the client.
    pub name: String,
    /// Underlying column name before aliasing, if the driver knows it.
    pub org_name: String,
    pub table: String,
    /// Declared type text, e.g. `VARCHAR(32)`.
    pub type_name: String,
    pub field_type: FieldType,
}

impl FieldInfo {
    #[must_use]
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        let name = name.into();
        Self {
            org_name: name.clone(),
            name,
            table: String::new(),
            type_name: String::new(),
            field_type,
        }
    }

    #[must_use]
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    #[must_use]
    pub fn with_type_name(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = type_name.into();
        self
    }
}
