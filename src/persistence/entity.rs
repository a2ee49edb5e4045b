use std::sync::Arc;

use arrow::array::ArrayRef;
use arrow::compute::cast;
use arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};

use crate::errors::{Error, Result};

/// Partition key column stamped with the generated batch id
pub const TIME_SERIES_ID_COLUMN: &str = "time_series_id";

/// Storage type of an entity column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    TimeUuid,
    Text,
    Integer,
    Double,
    Timestamp,
}

impl ColumnKind {
    /// Map an arrow column type onto a storage type
    pub fn from_data_type(data_type: &DataType) -> Option<Self> {
        match data_type {
            DataType::Utf8 | DataType::LargeUtf8 => Some(ColumnKind::Text),
            DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64 => {
                Some(ColumnKind::Integer)
            }
            DataType::Float32 | DataType::Float64 => Some(ColumnKind::Double),
            DataType::Timestamp(_, _) | DataType::Date32 | DataType::Date64 => {
                Some(ColumnKind::Timestamp)
            }
            _ => None,
        }
    }

    /// Canonical arrow type values of this kind are normalised to before
    /// they reach a sink
    pub fn arrow_type(&self) -> DataType {
        match self {
            ColumnKind::TimeUuid | ColumnKind::Text => DataType::Utf8,
            ColumnKind::Integer => DataType::Int64,
            ColumnKind::Double => DataType::Float64,
            ColumnKind::Timestamp => DataType::Timestamp(TimeUnit::Microsecond, None),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyRole {
    Partition,
    /// Ascending clustering key
    Clustering,
    Regular,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityColumn {
    /// Column in the source batch; `None` for generated columns
    pub source: Option<String>,
    pub name: String,
    pub kind: ColumnKind,
    pub role: KeyRole,
}

/// Table description derived from the column types of a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeseriesEntity {
    pub keyspace: String,
    pub table_name: String,
    pub columns: Vec<EntityColumn>,
}

impl TimeseriesEntity {
    /// Fails on the first column whose type has no storage mapping
    pub fn from_schema(schema: &Schema, keyspace: &str, table_name: &str) -> Result<Self> {
        let mut columns = vec![EntityColumn {
            source: None,
            name: TIME_SERIES_ID_COLUMN.to_string(),
            kind: ColumnKind::TimeUuid,
            role: KeyRole::Partition,
        }];

        for field in schema.fields() {
            let kind = ColumnKind::from_data_type(field.data_type()).ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "Invalid column dtype: {} (column '{}')",
                    field.data_type(),
                    field.name()
                ))
            })?;

            let (name, role) = match kind {
                ColumnKind::Timestamp => (format!("ts_{}", field.name()), KeyRole::Clustering),
                _ => (field.name().clone(), KeyRole::Regular),
            };

            columns.push(EntityColumn {
                source: Some(field.name().clone()),
                name,
                kind,
                role,
            });
        }

        Ok(Self {
            keyspace: keyspace.to_string(),
            table_name: table_name.to_string(),
            columns,
        })
    }

    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.keyspace, self.table_name)
    }

    pub fn partition_columns(&self) -> impl Iterator<Item = &EntityColumn> {
        self.columns.iter().filter(|c| c.role == KeyRole::Partition)
    }

    pub fn clustering_columns(&self) -> impl Iterator<Item = &EntityColumn> {
        self.columns.iter().filter(|c| c.role == KeyRole::Clustering)
    }

    /// Columns filled from the source batch, in schema order
    pub fn data_columns(&self) -> impl Iterator<Item = &EntityColumn> {
        self.columns.iter().filter(|c| c.source.is_some())
    }

    /// Schema of stored rows: the id column followed by the data columns
    pub fn storage_schema(&self) -> SchemaRef {
        let fields: Vec<Field> = self
            .columns
            .iter()
            .map(|c| Field::new(&c.name, c.kind.arrow_type(), c.role == KeyRole::Regular))
            .collect();
        Arc::new(Schema::new(fields))
    }
}

/// Cast `array` to the canonical arrow type of `kind`
pub(crate) fn normalize_column(array: &ArrayRef, kind: ColumnKind) -> Result<ArrayRef> {
    let target = kind.arrow_type();
    if array.data_type() == &target {
        return Ok(Arc::clone(array));
    }
    Ok(cast(array, &target)?)
}
