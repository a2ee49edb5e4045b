use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use arrow::array::{
    ArrayRef, BooleanBuilder, Float64Builder, Int64Builder, NullArray, StringBuilder,
    TimestampMicrosecondBuilder,
};
use arrow::datatypes::{DataType, TimeUnit};
use chrono::NaiveDateTime;

/// A single cell of a backend row
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Int64(i64),
    Float64(f64),
    Utf8(String),
    Timestamp(NaiveDateTime),
}

/// Positionally aligned with the column list of the cursor that produced it
pub type Row = Vec<Value>;

pub(crate) const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

static NULL: Value = Value::Null;

/// Hashable projection of a [`Value`] used to match join keys
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum JoinKey {
    Boolean(bool),
    Int(i64),
    Float(u64),
    Utf8(String),
    Timestamp(NaiveDateTime),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// `None` for cells that never match (nulls and NaN)
    pub(crate) fn join_key(&self) -> Option<JoinKey> {
        match self {
            Value::Null => None,
            Value::Boolean(b) => Some(JoinKey::Boolean(*b)),
            Value::Int64(i) => Some(JoinKey::Int(*i)),
            Value::Float64(f) if f.is_nan() => None,
            Value::Float64(f) => {
                if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64 {
                    Some(JoinKey::Int(*f as i64))
                } else {
                    Some(JoinKey::Float(f.to_bits()))
                }
            }
            Value::Utf8(s) => Some(JoinKey::Utf8(s.clone())),
            Value::Timestamp(ts) => Some(JoinKey::Timestamp(*ts)),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Int64(_) | Value::Float64(_) => 0,
            Value::Boolean(_) => 1,
            Value::Utf8(_) => 2,
            Value::Timestamp(_) => 3,
            Value::Null => 4,
        }
    }

    /// Total order used to sort join output: numbers, booleans, text,
    /// timestamps, then nulls.
    pub(crate) fn cmp_key(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Int64(a), Value::Int64(b)) => a.cmp(b),
            (Value::Int64(a), Value::Float64(b)) => cmp_int_float(*a, *b),
            (Value::Float64(a), Value::Int64(b)) => cmp_int_float(*b, *a).reverse(),
            // zeros compare equal, as they join
            (Value::Float64(a), Value::Float64(b)) => {
                a.partial_cmp(b).unwrap_or_else(|| a.total_cmp(b))
            }
            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            (Value::Utf8(a), Value::Utf8(b)) => a.cmp(b),
            (Value::Timestamp(a), Value::Timestamp(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }

    pub(crate) fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Boolean(b) => serde_json::Value::Bool(*b),
            Value::Int64(i) => serde_json::Value::from(*i),
            // non-finite floats have no JSON number form
            Value::Float64(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Utf8(s) => serde_json::Value::String(s.clone()),
            Value::Timestamp(_) => serde_json::Value::String(self.to_string()),
        }
    }

    fn data_type(&self) -> Option<DataType> {
        match self {
            Value::Null => None,
            Value::Boolean(_) => Some(DataType::Boolean),
            Value::Int64(_) => Some(DataType::Int64),
            Value::Float64(_) => Some(DataType::Float64),
            Value::Utf8(_) => Some(DataType::Utf8),
            Value::Timestamp(_) => Some(DataType::Timestamp(TimeUnit::Microsecond, None)),
        }
    }
}

/// Exact comparison of an integer against a float, agreeing with
/// [`Value::join_key`] on which pairs are equal.
fn cmp_int_float(i: i64, f: f64) -> Ordering {
    if f.is_nan() {
        return if f.is_sign_negative() { Ordering::Greater } else { Ordering::Less };
    }
    // beyond this every i64 is strictly smaller in magnitude
    if f.abs() >= 1.0e38 {
        return if f > 0.0 { Ordering::Less } else { Ordering::Greater };
    }

    let whole = f.trunc();
    match (i as i128).cmp(&(whole as i128)) {
        Ordering::Equal if f > whole => Ordering::Less,
        Ordering::Equal if f < whole => Ordering::Greater,
        ordering => ordering,
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Int64(i) => write!(f, "{}", i),
            Value::Float64(v) => write!(f, "{}", v),
            Value::Utf8(s) => write!(f, "{}", s),
            Value::Timestamp(ts) => write!(f, "{}", ts.format(TIMESTAMP_FORMAT)),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int64(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float64(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Utf8(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Utf8(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::Timestamp(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Arrow type able to hold every non-null cell of the column.
///
/// Integers widen to floats when both appear; any other mix falls back to
/// `Utf8`. A column of nulls only is `DataType::Null`.
pub fn infer_data_type<'a>(values: impl Iterator<Item = &'a Value>) -> DataType {
    let mut inferred: Option<DataType> = None;

    for data_type in values.filter_map(Value::data_type) {
        inferred = Some(match inferred {
            None => data_type,
            Some(current) if current == data_type => current,
            Some(DataType::Int64) if data_type == DataType::Float64 => DataType::Float64,
            Some(DataType::Float64) if data_type == DataType::Int64 => DataType::Float64,
            Some(_) => DataType::Utf8,
        });
    }

    inferred.unwrap_or(DataType::Null)
}

/// Build the arrow array for column `index` of `rows`
pub fn column_to_array(rows: &[Row], index: usize) -> ArrayRef {
    let cells = || rows.iter().map(move |row| row.get(index).unwrap_or(&NULL));
    let len = rows.len();

    match infer_data_type(cells()) {
        DataType::Boolean => {
            let mut builder = BooleanBuilder::with_capacity(len);
            for cell in cells() {
                match cell {
                    Value::Boolean(b) => builder.append_value(*b),
                    _ => builder.append_null(),
                }
            }
            Arc::new(builder.finish()) as ArrayRef
        }
        DataType::Int64 => {
            let mut builder = Int64Builder::with_capacity(len);
            for cell in cells() {
                match cell {
                    Value::Int64(i) => builder.append_value(*i),
                    _ => builder.append_null(),
                }
            }
            Arc::new(builder.finish()) as ArrayRef
        }
        DataType::Float64 => {
            let mut builder = Float64Builder::with_capacity(len);
            for cell in cells() {
                match cell {
                    Value::Float64(f) => builder.append_value(*f),
                    Value::Int64(i) => builder.append_value(*i as f64),
                    _ => builder.append_null(),
                }
            }
            Arc::new(builder.finish()) as ArrayRef
        }
        DataType::Timestamp(_, _) => {
            let mut builder = TimestampMicrosecondBuilder::with_capacity(len);
            for cell in cells() {
                match cell {
                    Value::Timestamp(ts) => builder.append_value(ts.and_utc().timestamp_micros()),
                    _ => builder.append_null(),
                }
            }
            Arc::new(builder.finish()) as ArrayRef
        }
        DataType::Utf8 => {
            let mut builder = StringBuilder::with_capacity(len, len * 8);
            for cell in cells() {
                match cell {
                    Value::Null => builder.append_null(),
                    Value::Utf8(s) => builder.append_value(s),
                    other => builder.append_value(other.to_string()),
                }
            }
            Arc::new(builder.finish()) as ArrayRef
        }
        _ => Arc::new(NullArray::new(len)) as ArrayRef,
    }
}
