//! Output accessors: pure converters from `(columns, rows)` to one of the
//! supported representations.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use arrow::compute::concat_batches;
use arrow::datatypes::{Field, Schema, SchemaRef};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;

use crate::errors::{Error, Result};
use crate::time_series::scalar_value::{Row, column_to_array};

/// Representation requested from a fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchType {
    /// Structured-record document (JSON, keys sorted)
    Json,
    /// In-memory arrow table
    #[default]
    Tabular,
    /// Row-partitioned arrow table for batch frameworks
    Distributed,
}

impl FromStr for FetchType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(FetchType::Json),
            "pandas" | "tabular" | "arrow" => Ok(FetchType::Tabular),
            "spark" | "distributed" => Ok(FetchType::Distributed),
            other => Err(Error::InvalidArgument(format!(
                "unsupported fetch type '{}', expected one of json, tabular, distributed",
                other
            ))),
        }
    }
}

impl fmt::Display for FetchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchType::Json => write!(f, "json"),
            FetchType::Tabular => write!(f, "tabular"),
            FetchType::Distributed => write!(f, "distributed"),
        }
    }
}

/// Arrow table split row-wise into contiguous partitions
#[derive(Debug, Clone)]
pub struct PartitionedTable {
    schema: SchemaRef,
    partitions: Vec<RecordBatch>,
}

impl PartitionedTable {
    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    pub fn partitions(&self) -> &[RecordBatch] {
        &self.partitions
    }

    pub fn num_partitions(&self) -> usize {
        self.partitions.len()
    }

    pub fn num_rows(&self) -> usize {
        self.partitions.iter().map(RecordBatch::num_rows).sum()
    }

    /// Concatenate the partitions back into one batch
    pub fn collect(&self) -> Result<RecordBatch> {
        Ok(concat_batches(&self.schema, &self.partitions)?)
    }
}

/// A fetched batch in the requested representation
#[derive(Debug, Clone)]
pub enum Rendered {
    Json(String),
    Tabular(RecordBatch),
    Distributed(PartitionedTable),
}

impl Rendered {
    pub fn fetch_type(&self) -> FetchType {
        match self {
            Rendered::Json(_) => FetchType::Json,
            Rendered::Tabular(_) => FetchType::Tabular,
            Rendered::Distributed(_) => FetchType::Distributed,
        }
    }

    pub fn as_json(&self) -> Option<&str> {
        match self {
            Rendered::Json(json) => Some(json),
            _ => None,
        }
    }

    pub fn as_record_batch(&self) -> Option<&RecordBatch> {
        match self {
            Rendered::Tabular(batch) => Some(batch),
            _ => None,
        }
    }

    pub fn as_partitioned(&self) -> Option<&PartitionedTable> {
        match self {
            Rendered::Distributed(table) => Some(table),
            _ => None,
        }
    }

    pub fn into_record_batch(self) -> Option<RecordBatch> {
        match self {
            Rendered::Tabular(batch) => Some(batch),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    pub partitions: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self { partitions: 4 }
    }
}

pub type Accessor = fn(&[String], &[Row], &RenderOptions) -> Result<Rendered>;

const ACCESSORS: [(FetchType, Accessor); 3] = [
    (FetchType::Json, to_json),
    (FetchType::Tabular, to_tabular),
    (FetchType::Distributed, to_distributed),
];

/// Render `(columns, rows)` through the accessor registered for `fetch_type`
pub fn render(
    fetch_type: FetchType,
    columns: &[String],
    rows: &[Row],
    options: &RenderOptions,
) -> Result<Rendered> {
    let (_, accessor) = ACCESSORS
        .iter()
        .find(|(kind, _)| *kind == fetch_type)
        .ok_or_else(|| Error::InvalidArgument(format!("no accessor for {}", fetch_type)))?;
    accessor(columns, rows, options)
}

pub fn to_json(columns: &[String], rows: &[Row], _options: &RenderOptions) -> Result<Rendered> {
    let data: Vec<serde_json::Value> = rows
        .iter()
        .map(|row| serde_json::Value::Array(row.iter().map(|value| value.to_json()).collect()))
        .collect();

    // serde_json::Map is ordered by key
    let mut document = serde_json::Map::new();
    document.insert("columns".to_string(), serde_json::Value::from(columns.to_vec()));
    document.insert("data".to_string(), serde_json::Value::Array(data));

    let mut out = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(b"    "));
    serde_json::Value::Object(document).serialize(&mut serializer)?;

    String::from_utf8(out)
        .map_err(|e| Error::InvalidArgument(e.to_string()))
        .map(Rendered::Json)
}

fn build_batch(columns: &[String], rows: &[Row]) -> Result<RecordBatch> {
    let arrays: Vec<_> = (0..columns.len())
        .map(|index| column_to_array(rows, index))
        .collect();
    let fields: Vec<Field> = columns
        .iter()
        .zip(&arrays)
        .map(|(name, array)| Field::new(name, array.data_type().clone(), true))
        .collect();

    let schema = Arc::new(Schema::new(fields));
    let options = RecordBatchOptions::new().with_row_count(Some(rows.len()));
    Ok(RecordBatch::try_new_with_options(schema, arrays, &options)?)
}

pub fn to_tabular(columns: &[String], rows: &[Row], _options: &RenderOptions) -> Result<Rendered> {
    build_batch(columns, rows).map(Rendered::Tabular)
}

pub fn to_distributed(
    columns: &[String],
    rows: &[Row],
    options: &RenderOptions,
) -> Result<Rendered> {
    let batch = build_batch(columns, rows)?;
    let schema = batch.schema();

    let num_rows = batch.num_rows();
    let partitions = options.partitions.max(1);
    let chunk = num_rows.div_ceil(partitions).max(1);

    let mut slices = Vec::with_capacity(partitions);
    let mut offset = 0;
    while offset < num_rows {
        let len = chunk.min(num_rows - offset);
        slices.push(batch.slice(offset, len));
        offset += len;
    }
    if slices.is_empty() {
        slices.push(batch);
    }

    Ok(Rendered::Distributed(PartitionedTable {
        schema,
        partitions: slices,
    }))
}
