//! Attribute data types and typed values.
//!
//! [`is_valid_data_type`], [`is_valid_typed_value`] and [`set_value`] are the
//! single source of truth for value conversion. Attribute construction, draft
//! materialization, validation and migration all go through them.
//!
//! # Examples
//!
//! ```
//! use pattern_toolkit_core::{DataType, TypedValue, is_valid_data_type, set_value};
//!
//! assert!(is_valid_data_type(DataType::Int, "42"));
//! assert!(!is_valid_data_type(DataType::Bool, "maybe"));
//!
//! let value = set_value(DataType::Bool, "True").unwrap();
//! assert_eq!(value, TypedValue::Bool(true));
//! assert_eq!(value.to_string(), "true");
//! ```

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ToolkitError};

/// The fixed set of attribute data types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    /// Free text (the default).
    #[default]
    String,
    /// `true` or `false`.
    Bool,
    /// 64-bit signed integer.
    Int,
    /// 64-bit floating point number.
    Float,
    /// UTC timestamp (RFC 3339, or a plain `YYYY-MM-DD` date).
    #[serde(rename = "datetime")]
    DateTime,
}

impl DataType {
    /// All supported data types, in declaration order.
    pub const ALL: [DataType; 5] = [
        DataType::String,
        DataType::Bool,
        DataType::Int,
        DataType::Float,
        DataType::DateTime,
    ];

    /// Returns the lowercase name used in messages and dehydrated bags.
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::String => "string",
            DataType::Bool => "bool",
            DataType::Int => "int",
            DataType::Float => "float",
            DataType::DateTime => "datetime",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = ToolkitError;

    fn from_str(s: &str) -> Result<Self> {
        DataType::ALL
            .into_iter()
            .find(|dt| dt.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ToolkitError::UnsupportedDataType(s.to_string()))
    }
}

/// A value converted to one of the [`DataType`]s.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    String(String),
    Bool(bool),
    Int(i64),
    Float(f64),
    DateTime(DateTime<Utc>),
}

impl TypedValue {
    /// Returns the data type this value was converted to.
    pub fn data_type(&self) -> DataType {
        match self {
            TypedValue::String(_) => DataType::String,
            TypedValue::Bool(_) => DataType::Bool,
            TypedValue::Int(_) => DataType::Int,
            TypedValue::Float(_) => DataType::Float,
            TypedValue::DateTime(_) => DataType::DateTime,
        }
    }

    /// Converts this value into the closest JSON value.
    ///
    /// Datetimes become RFC 3339 strings.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            TypedValue::String(s) => serde_json::Value::String(s.clone()),
            TypedValue::Bool(b) => serde_json::Value::Bool(*b),
            TypedValue::Int(i) => serde_json::Value::from(*i),
            TypedValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            TypedValue::DateTime(_) => serde_json::Value::String(self.to_string()),
        }
    }

    /// Best-effort conversion of this value to another data type.
    ///
    /// Returns `None` when the textual form does not parse as `data_type`.
    pub fn retype(&self, data_type: DataType) -> Option<TypedValue> {
        if self.data_type() == data_type {
            return Some(self.clone());
        }
        set_value(data_type, &self.to_string()).ok()
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypedValue::String(s) => f.write_str(s),
            TypedValue::Bool(b) => write!(f, "{b}"),
            TypedValue::Int(i) => write!(f, "{i}"),
            TypedValue::Float(x) => write!(f, "{x}"),
            TypedValue::DateTime(dt) => {
                f.write_str(&dt.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
        }
    }
}

/// Returns `true` if `value` converts to `data_type`.
pub fn is_valid_data_type(data_type: DataType, value: &str) -> bool {
    match data_type {
        DataType::String => true,
        DataType::Bool => parse_bool(value).is_some(),
        DataType::Int => value.trim().parse::<i64>().is_ok(),
        DataType::Float => value.trim().parse::<f64>().is_ok(),
        DataType::DateTime => parse_datetime(value).is_some(),
    }
}

/// Returns `true` if an already-typed `value` is acceptable for `data_type`.
///
/// Integers are acceptable where floats are expected.
pub fn is_valid_typed_value(data_type: DataType, value: &TypedValue) -> bool {
    match data_type {
        DataType::String => matches!(value, TypedValue::String(_)),
        DataType::Bool => matches!(value, TypedValue::Bool(_)),
        DataType::Int => matches!(value, TypedValue::Int(_)),
        DataType::Float => matches!(value, TypedValue::Float(_) | TypedValue::Int(_)),
        DataType::DateTime => matches!(value, TypedValue::DateTime(_)),
    }
}

/// Converts a raw string to a [`TypedValue`] of `data_type`.
///
/// # Errors
///
/// Returns [`ToolkitError::InvalidValue`] when `raw` does not convert.
pub fn set_value(data_type: DataType, raw: &str) -> Result<TypedValue> {
    let invalid = || ToolkitError::InvalidValue {
        value: raw.to_string(),
        data_type: data_type.to_string(),
    };

    let value = match data_type {
        DataType::String => TypedValue::String(raw.to_string()),
        DataType::Bool => TypedValue::Bool(parse_bool(raw).ok_or_else(invalid)?),
        DataType::Int => TypedValue::Int(raw.trim().parse().map_err(|_| invalid())?),
        DataType::Float => TypedValue::Float(raw.trim().parse().map_err(|_| invalid())?),
        DataType::DateTime => TypedValue::DateTime(parse_datetime(raw).ok_or_else(invalid)?),
    };
    Ok(value)
}

fn parse_bool(value: &str) -> Option<bool> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("true") {
        Some(true)
    } else if value.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

fn parse_datetime(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_data_type_from_str() {
        assert_eq!("DateTime".parse::<DataType>().unwrap(), DataType::DateTime);
        assert_eq!("bool".parse::<DataType>().unwrap(), DataType::Bool);
        assert!(matches!(
            "decimal".parse::<DataType>(),
            Err(ToolkitError::UnsupportedDataType(_))
        ));
    }

    #[test]
    fn test_set_value_converts_each_type() {
        assert_eq!(
            set_value(DataType::String, "hi").unwrap(),
            TypedValue::String("hi".into())
        );
        assert_eq!(set_value(DataType::Int, " 7 ").unwrap(), TypedValue::Int(7));
        assert_eq!(
            set_value(DataType::Float, "2.5").unwrap(),
            TypedValue::Float(2.5)
        );
        let date = set_value(DataType::DateTime, "2024-01-15").unwrap();
        assert_eq!(date.to_string(), "2024-01-15T00:00:00Z");
    }

    #[test]
    fn test_set_value_rejects_invalid_input() {
        assert!(matches!(
            set_value(DataType::Int, "4.2"),
            Err(ToolkitError::InvalidValue { .. })
        ));
        assert!(set_value(DataType::DateTime, "yesterday").is_err());
    }

    #[test]
    fn test_typed_value_validity_allows_int_as_float() {
        assert!(is_valid_typed_value(DataType::Float, &TypedValue::Int(3)));
        assert!(!is_valid_typed_value(DataType::Int, &TypedValue::Float(3.0)));
        assert!(!is_valid_typed_value(
            DataType::Bool,
            &TypedValue::String("true".into())
        ));
    }

    #[test]
    fn test_retype_is_best_effort() {
        let value = TypedValue::String("12".into());
        assert_eq!(value.retype(DataType::Int), Some(TypedValue::Int(12)));
        assert_eq!(value.retype(DataType::Bool), None);
    }

    fn data_type_strategy() -> impl Strategy<Value = DataType> {
        prop::sample::select(DataType::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn prop_set_value_round_trips(data_type in data_type_strategy(), raw in ".{0,24}") {
            if let Ok(value) = set_value(data_type, &raw) {
                prop_assert!(is_valid_data_type(data_type, &value.to_string()));
                prop_assert!(is_valid_typed_value(data_type, &value));
            }
        }

        #[test]
        fn prop_integers_round_trip(n in any::<i64>()) {
            let value = set_value(DataType::Int, &n.to_string()).unwrap();
            prop_assert_eq!(value, TypedValue::Int(n));
        }
    }
}
