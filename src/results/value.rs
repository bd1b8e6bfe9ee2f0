use crate::error::SqlOffloadError;

use super::field::FieldInfo;

/// Decode a column's raw text-protocol bytes into a Rust value.
pub trait FromField: Sized {
    /// # Errors
    /// Returns [`SqlOffloadError::ConversionError`] when the bytes do not fit `Self`.
    fn from_field(raw: Option<&[u8]>, field: &FieldInfo) -> Result<Self, SqlOffloadError>;
}

fn required<'a>(raw: Option<&'a [u8]>, field: &FieldInfo) -> Result<&'a [u8], SqlOffloadError> {
    raw.ok_or_else(|| {
        SqlOffloadError::ConversionError(format!("column '{}' is NULL", field.name))
    })
}

fn text<'a>(raw: Option<&'a [u8]>, field: &FieldInfo) -> Result<&'a str, SqlOffloadError> {
    std::str::from_utf8(required(raw, field)?).map_err(|err| {
        SqlOffloadError::ConversionError(format!("column '{}' is not UTF-8: {err}", field.name))
    })
}

macro_rules! parse_from_text {
    ($($ty:ty),*) => {
        $(
            impl FromField for $ty {
                fn from_field(raw: Option<&[u8]>, field: &FieldInfo) -> Result<Self, SqlOffloadError> {
                    let value = text(raw, field)?;
                    value.trim().parse::<$ty>().map_err(|err| {
                        SqlOffloadError::ConversionError(format!(
                            "column '{}' value {value:?} is not {}: {err}",
                            field.name,
                            stringify!($ty),
                        ))
                    })
                }
            }
        )*
    };
}

parse_from_text!(i8, i16, i32, i64, u8, u16, u32, u64, f32, f64);

impl FromField for String {
    fn from_field(raw: Option<&[u8]>, field: &FieldInfo) -> Result<Self, SqlOffloadError> {
        text(raw, field).map(str::to_owned)
    }
}

impl FromField for Vec<u8> {
    fn from_field(raw: Option<&[u8]>, field: &FieldInfo) -> Result<Self, SqlOffloadError> {
        required(raw, field).map(<[u8]>::to_vec)
    }
}

impl FromField for bool {
    fn from_field(raw: Option<&[u8]>, field: &FieldInfo) -> Result<Self, SqlOffloadError> {
        match text(raw, field)?.trim() {
            "1" | "true" | "TRUE" => Ok(true),
            "0" | "false" | "FALSE" => Ok(false),
            other => Err(SqlOffloadError::ConversionError(format!(
                "column '{}' value {other:?} is not a boolean",
                field.name
            ))),
        }
    }
}

impl<T: FromField> FromField for Option<T> {
    fn from_field(raw: Option<&[u8]>, field: &FieldInfo) -> Result<Self, SqlOffloadError> {
        match raw {
            None => Ok(None),
            Some(bytes) => T::from_field(Some(bytes), field).map(Some),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::FieldType;

    fn field() -> FieldInfo {
        FieldInfo::new("n", FieldType::Integer)
    }

    #[test]
    fn decodes_numbers_text_and_null() {
        assert_eq!(i64::from_field(Some(b"42"), &field()).unwrap(), 42);
        assert!((f64::from_field(Some(b"2.5"), &field()).unwrap() - 2.5).abs() < f64::EPSILON);
        assert_eq!(String::from_field(Some(b"abc"), &field()).unwrap(), "abc");
        assert_eq!(Option::<i32>::from_field(None, &field()).unwrap(), None);
        assert!(bool::from_field(Some(b"1"), &field()).unwrap());
    }

    #[test]
    fn null_into_non_option_is_an_error() {
        let err = i64::from_field(None, &field()).unwrap_err();
        assert!(matches!(err, SqlOffloadError::ConversionError(_)));
    }

    #[test]
    fn garbage_number_is_an_error() {
        assert!(u32::from_field(Some(b"-3"), &field()).is_err());
        assert!(i64::from_field(Some(b"abc"), &field()).is_err());
    }
}
