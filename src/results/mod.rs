mod field;
mod result_set;
mod row;
mod value;

pub use field::{FieldInfo, FieldType};
pub(crate) use result_set::ResultAnchor;
pub use result_set::ResultSet;
pub use row::Row;
pub use value::FromField;
