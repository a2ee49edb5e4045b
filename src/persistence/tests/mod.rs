
use super::*;
use arrow::{
    array::{Float64Array, Int64Array, StringArray, TimestampMicrosecondArray},
    datatypes::{DataType, Field, Schema, TimeUnit},
    record_batch::RecordBatch,
};
use std::sync::Arc;

pub fn turbine_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("datetime", DataType::Timestamp(TimeUnit::Microsecond, None), false),
        Field::new("turbine", DataType::Utf8, false),
        Field::new("active power", DataType::Float64, true),
        Field::new("status", DataType::Int64, true),
    ]))
}

/// `rows` consecutive seconds of readings for one turbine
pub fn turbine_batch(rows: usize) -> RecordBatch {
    let base = 1_546_300_800_000_000i64; // 2019-01-01T00:00:00
    let times: Vec<i64> = (0..rows as i64).map(|i| base + i * 1_000_000).collect();
    let power: Vec<f64> = (0..rows).map(|i| 100.0 + i as f64 * 0.5).collect();
    let status: Vec<i64> = (0..rows as i64).map(|i| i % 3).collect();

    RecordBatch::try_new(
        turbine_schema(),
        vec![
            Arc::new(TimestampMicrosecondArray::from(times)),
            Arc::new(StringArray::from(vec!["WT-01"; rows])),
            Arc::new(Float64Array::from(power)),
            Arc::new(Int64Array::from(status)),
        ],
    )
    .unwrap()
}
