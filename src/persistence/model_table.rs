use std::fmt;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::compute::{cast, concat_batches};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use crate::errors::{Error, Result};

/// How far compressed buffers are pushed on flush
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushMode {
    /// In-memory buffers to local disk
    Memory,
    /// Local disk, then compressed segments to the object store
    Edge,
}

impl fmt::Display for FlushMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlushMode::Memory => write!(f, "FlushMemory"),
            FlushMode::Edge => write!(f, "FlushEdge"),
        }
    }
}

/// Backend accepting model tables (compressed, error-bounded storage)
pub trait ModelSink: Send + Sync {
    fn list_tables(&self) -> Result<Vec<String>>;
    fn execute_statement(&self, statement: &str) -> Result<()>;
    fn insert(&self, table: &str, batch: &RecordBatch) -> Result<()>;
    fn flush(&self, mode: FlushMode) -> Result<()>;
}

/// A batch whose schema only uses types a model table can hold
#[derive(Debug, Clone)]
pub struct ModelTable {
    batch: RecordBatch,
}

impl ModelTable {
    /// Normalise names and types: spaces become underscores, 64-bit numbers
    /// become `Float32`, microsecond timestamps become millisecond ones.
    pub fn from_record_batch(batch: RecordBatch) -> Result<Self> {
        let schema = batch.schema();
        let mut fields = Vec::with_capacity(schema.fields().len());
        let mut columns = Vec::with_capacity(schema.fields().len());

        for (field, column) in schema.fields().iter().zip(batch.columns()) {
            let target = match field.data_type() {
                DataType::Float64 | DataType::Int64 => DataType::Float32,
                DataType::Timestamp(TimeUnit::Microsecond, tz) => {
                    DataType::Timestamp(TimeUnit::Millisecond, tz.clone())
                }
                other => other.clone(),
            };

            let column = if &target == field.data_type() {
                Arc::clone(column)
            } else {
                cast(column, &target)?
            };

            fields.push(Field::new(
                field.name().replace(' ', "_"),
                target,
                field.is_nullable(),
            ));
            columns.push(column);
        }

        let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?;
        Ok(Self { batch })
    }

    /// Read every row group of a parquet file into one normalised table
    pub fn from_parquet_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let builder = ParquetRecordBatchReaderBuilder::try_new(File::open(path)?)?;
        let schema = Arc::clone(builder.schema());

        let batches = builder
            .build()?
            .collect::<std::result::Result<Vec<_>, ArrowError>>()?;
        let batch = concat_batches(&schema, &batches)?;
        log::debug!("Read {} rows from {}", batch.num_rows(), path.display());

        Self::from_record_batch(batch)
    }

    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    pub fn create_statement(&self, table_name: &str, error_bound: f32) -> Result<String> {
        let schema = self.batch.schema();
        let mut columns = Vec::with_capacity(schema.fields().len());

        for field in schema.fields() {
            let definition = match field.data_type() {
                DataType::Timestamp(TimeUnit::Millisecond, _) => "TIMESTAMP".to_string(),
                DataType::Float32 => format!("FIELD({})", error_bound),
                DataType::Utf8 => "TAG".to_string(),
                other => {
                    return Err(Error::InvalidArgument(format!(
                        "Unsupported data type {} for column '{}'",
                        other,
                        field.name()
                    )));
                }
            };
            columns.push(format!("{} {}", field.name(), definition));
        }

        Ok(format!("CREATE MODEL TABLE {} ({})", table_name, columns.join(", ")))
    }

    /// Create the model table when the sink lacks it, then insert the batch
    pub fn persist(&self, sink: &dyn ModelSink, table_name: &str, error_bound: f32) -> Result<()> {
        if !sink.list_tables()?.iter().any(|t| t == table_name) {
            let statement = self.create_statement(table_name, error_bound)?;
            sink.execute_statement(&statement)?;
            log::info!("Model table '{}' created.", table_name);
        }

        sink.insert(table_name, &self.batch)?;
        log::info!("Data inserted successfully into the table '{}'.", table_name);
        Ok(())
    }

    pub fn flush(&self, sink: &dyn ModelSink, mode: FlushMode) -> Result<()> {
        sink.flush(mode)?;
        log::info!("{}: compressed data buffers flushed.", mode);
        Ok(())
    }
}
