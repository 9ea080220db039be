use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// A single scalar value of a record.
///
/// Nested arrays and objects are kept opaque as [`Cell::Json`]. Equality is typed: `I64(1)` and
/// `F64(1.0)` are different values. Floats compare and hash by bit pattern so that cells can be
/// used inside keys.
#[derive(Debug, Clone)]
pub enum Cell {
    Null,
    Bool(bool),
    I64(i64),
    U64(u64),
    F64(f64),
    String(String),
    Json(Value),
}

impl Cell {
    /// Returns `true` for [`Cell::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    /// Returns the name of the value type, matching the declared schema type names.
    pub fn type_name(&self) -> &'static str {
        match self {
            Cell::Null => "null",
            Cell::Bool(_) => "boolean",
            Cell::I64(_) | Cell::U64(_) => "integer",
            Cell::F64(_) => "float",
            Cell::String(_) => "string",
            Cell::Json(_) => "json",
        }
    }

    /// Converts the cell back into a JSON value.
    pub fn to_json(&self) -> Value {
        match self {
            Cell::Null => Value::Null,
            Cell::Bool(v) => Value::Bool(*v),
            Cell::I64(v) => Value::from(*v),
            Cell::U64(v) => Value::from(*v),
            Cell::F64(v) => serde_json::Number::from_f64(*v)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Cell::String(v) => Value::String(v.clone()),
            Cell::Json(v) => v.clone(),
        }
    }
}

impl PartialEq for Cell {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Cell::Null, Cell::Null) => true,
            (Cell::Bool(a), Cell::Bool(b)) => a == b,
            (Cell::I64(a), Cell::I64(b)) => a == b,
            (Cell::U64(a), Cell::U64(b)) => a == b,
            (Cell::F64(a), Cell::F64(b)) => a.to_bits() == b.to_bits(),
            (Cell::String(a), Cell::String(b)) => a == b,
            (Cell::Json(a), Cell::Json(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Cell {}

impl Hash for Cell {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);

        match self {
            Cell::Null => {}
            Cell::Bool(v) => v.hash(state),
            Cell::I64(v) => v.hash(state),
            Cell::U64(v) => v.hash(state),
            Cell::F64(v) => v.to_bits().hash(state),
            Cell::String(v) => v.hash(state),
            // Objects render with sorted keys, so equal values render identically.
            Cell::Json(v) => v.to_string().hash(state),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => f.write_str("null"),
            Cell::Bool(v) => write!(f, "{v}"),
            Cell::I64(v) => write!(f, "{v}"),
            Cell::U64(v) => write!(f, "{v}"),
            Cell::F64(v) => write!(f, "{v}"),
            Cell::String(v) => write!(f, "{v:?}"),
            Cell::Json(v) => write!(f, "{v}"),
        }
    }
}

impl From<Value> for Cell {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Cell::Null,
            Value::Bool(v) => Cell::Bool(v),
            Value::Number(n) => {
                if let Some(v) = n.as_i64() {
                    Cell::I64(v)
                } else if let Some(v) = n.as_u64() {
                    Cell::U64(v)
                } else {
                    Cell::F64(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Value::String(v) => Cell::String(v),
            value @ (Value::Array(_) | Value::Object(_)) => Cell::Json(value),
        }
    }
}

impl From<&Cell> for Value {
    fn from(cell: &Cell) -> Self {
        cell.to_json()
    }
}

impl From<bool> for Cell {
    fn from(value: bool) -> Self {
        Cell::Bool(value)
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Cell::I64(value)
    }
}

impl From<i32> for Cell {
    fn from(value: i32) -> Self {
        Cell::I64(value.into())
    }
}

impl From<u64> for Cell {
    fn from(value: u64) -> Self {
        Cell::U64(value)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::F64(value)
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::String(value.to_owned())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::String(value)
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Cell::Null)
    }
}

impl Serialize for Cell {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Cell::Null => serializer.serialize_unit(),
            Cell::Bool(v) => serializer.serialize_bool(*v),
            Cell::I64(v) => serializer.serialize_i64(*v),
            Cell::U64(v) => serializer.serialize_u64(*v),
            Cell::F64(v) => serializer.serialize_f64(*v),
            Cell::String(v) => serializer.serialize_str(v),
            Cell::Json(v) => v.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Cell {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Cell::from)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::hash_map::DefaultHasher;

    use serde_json::json;

    use super::*;

    fn hash_cell(cell: &Cell) -> u64 {
        let mut hasher = DefaultHasher::new();
        cell.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn json_numbers_map_to_narrowest_cell() {
        assert_eq!(Cell::from(json!(7)), Cell::I64(7));
        assert_eq!(Cell::from(json!(u64::MAX)), Cell::U64(u64::MAX));
        assert_eq!(Cell::from(json!(1.5)), Cell::F64(1.5));
    }

    #[test]
    fn nested_values_stay_opaque() {
        let cell = Cell::from(json!({"b": 1, "a": [1, 2]}));
        assert_eq!(cell.type_name(), "json");
        assert_eq!(cell.to_json(), json!({"a": [1, 2], "b": 1}));
    }

    #[test]
    fn equality_is_typed() {
        assert_ne!(Cell::I64(1), Cell::F64(1.0));
        assert_ne!(Cell::String("1".into()), Cell::I64(1));
        assert_eq!(Cell::Null, Cell::Null);
    }

    #[test]
    fn floats_hash_by_bits() {
        assert_eq!(hash_cell(&Cell::F64(0.5)), hash_cell(&Cell::F64(0.5)));
        assert_ne!(hash_cell(&Cell::F64(0.0)), hash_cell(&Cell::F64(-0.0)));
        assert_eq!(Cell::F64(f64::NAN), Cell::F64(f64::NAN));
    }

    #[test]
    fn display_quotes_strings() {
        assert_eq!(Cell::from("a").to_string(), "\"a\"");
        assert_eq!(Cell::I64(3).to_string(), "3");
        assert_eq!(Cell::Null.to_string(), "null");
    }
}
