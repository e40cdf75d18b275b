//! The coercion table: turning a raw string captured from a path segment or
//! a query parameter into a typed handler argument.

use emberhttp_core::util::lower_ascii;
use thiserror::Error;

/// A raw string pulled from the request (a path capture, or a query value),
/// or the marker for "this query parameter wasn't present at all".
#[derive(Debug, Clone)]
pub enum Value {
    Str(String),
    Missing,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoercionError {
    #[error("required argument at position {0} was missing")]
    RequiredMissing(usize),
    #[error("could not coerce {value:?} to the expected type at position {position}")]
    BadFormat { position: usize, value: String },
}

/// Implemented for every type a handler may request as an argument.
///
/// `OPTIONAL` lets the router compute, purely from the handler's formal
/// argument types, which query parameters are required versus optional,
/// without the caller spelling that out a second time.
pub trait FromValue: Sized {
    const OPTIONAL: bool = false;

    fn from_value(value: Value, position: usize) -> Result<Self, CoercionError>;
}

impl FromValue for String {
    fn from_value(value: Value, position: usize) -> Result<Self, CoercionError> {
        match value {
            Value::Str(s) => Ok(s),
            Value::Missing => Err(CoercionError::RequiredMissing(position)),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    const OPTIONAL: bool = true;

    fn from_value(value: Value, position: usize) -> Result<Self, CoercionError> {
        match value {
            Value::Missing => Ok(None),
            other => T::from_value(other, position).map(Some),
        }
    }
}

macro_rules! impl_from_value_parse {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl FromValue for $ty {
                fn from_value(value: Value, position: usize) -> Result<Self, CoercionError> {
                    match value {
                        Value::Missing => Err(CoercionError::RequiredMissing(position)),
                        Value::Str(s) => s.parse::<$ty>().map_err(|_| CoercionError::BadFormat {
                            position,
                            value: s,
                        }),
                    }
                }
            }
        )+
    };
}

impl_from_value_parse!(i8, i16, i32, i64, i128, u8, u16, u32, u64, u128, f32, f64);

impl FromValue for bool {
    fn from_value(value: Value, position: usize) -> Result<Self, CoercionError> {
        match value {
            Value::Missing => Err(CoercionError::RequiredMissing(position)),
            Value::Str(s) => match lower_ascii(&s).as_str() {
                "true" | "1" => Ok(true),
                "false" | "0" => Ok(false),
                _ => Err(CoercionError::BadFormat { position, value: s }),
            },
        }
    }
}

impl FromValue for chrono::NaiveDate {
    fn from_value(value: Value, position: usize) -> Result<Self, CoercionError> {
        match value {
            Value::Missing => Err(CoercionError::RequiredMissing(position)),
            Value::Str(s) => chrono::NaiveDate::parse_from_str(&s, "%Y-%m-%d")
                .map_err(|_| CoercionError::BadFormat { position, value: s }),
        }
    }
}

impl FromValue for chrono::DateTime<chrono::Utc> {
    fn from_value(value: Value, position: usize) -> Result<Self, CoercionError> {
        match value {
            Value::Missing => Err(CoercionError::RequiredMissing(position)),
            Value::Str(s) => {
                if let Ok(ts) = s.parse::<i64>() {
                    return chrono::DateTime::from_timestamp(ts, 0)
                        .ok_or_else(|| CoercionError::BadFormat { position, value: s.clone() });
                }
                chrono::DateTime::parse_from_rfc3339(&s)
                    .map(|dt| dt.with_timezone(&chrono::Utc))
                    .map_err(|_| CoercionError::BadFormat { position, value: s })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_string_from_missing_errors() {
        assert_eq!(String::from_value(Value::Missing, 0), Err(CoercionError::RequiredMissing(0)));
    }

    #[test]
    fn optional_int_from_missing_is_none() {
        assert_eq!(Option::<i64>::from_value(Value::Missing, 2).unwrap(), None);
    }

    #[test]
    fn bool_accepts_common_spellings() {
        assert_eq!(bool::from_value(Value::Str("true".into()), 0).unwrap(), true);
        assert_eq!(bool::from_value(Value::Str("0".into()), 0).unwrap(), false);
        assert!(bool::from_value(Value::Str("nah".into()), 0).is_err());
    }

    #[test]
    fn date_parses_iso8601() {
        let d = chrono::NaiveDate::from_value(Value::Str("2024-03-05".into()), 0).unwrap();
        assert_eq!(d.to_string(), "2024-03-05");
    }
}
