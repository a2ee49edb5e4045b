use arrow::datatypes::{Float64Type, Int64Type, TimestampMicrosecondType};
use arrow::record_batch::RecordBatch;
use arrow_array::cast::AsArray;
use arrow_array::{Array, ArrayRef};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use mysql::consts::ColumnType;
use mysql::prelude::*;
use mysql::{Pool, PooledConn, TxOpts};
use uuid::Uuid;

use super::entity::normalize_column;
use super::{
    ColumnDescription, ColumnKind, DbSession, KeyRole, Session, SessionProvider, Sink,
    SinkSession, TimeseriesEntity,
};
use crate::errors::{Error, Result};
use crate::time_series::{Row, RowStream, Value};

impl From<mysql::Error> for Error {
    fn from(e: mysql::Error) -> Self {
        Error::BackendExecution(e.to_string())
    }
}

/// Source backed by a MySQL-protocol server
#[derive(Clone)]
pub struct MySqlSource {
    pool: Pool,
}

impl MySqlSource {
    pub fn connect(url: &str) -> Result<Self> {
        Ok(Self { pool: Pool::new(url)? })
    }

    pub fn from_pool(pool: Pool) -> Self {
        Self { pool }
    }
}

impl SessionProvider for MySqlSource {
    fn create_session(&self) -> Result<Box<dyn Session>> {
        Ok(Box::new(MySqlSession {
            conn: Some(self.pool.get_conn()?),
            columns: Vec::new(),
            column_types: Vec::new(),
            rows: Vec::new(),
        }))
    }
}

struct MySqlSession {
    conn: Option<PooledConn>,
    columns: Vec<ColumnDescription>,
    column_types: Vec<ColumnType>,
    rows: Vec<mysql::Row>,
}

fn closed() -> Error {
    Error::BackendExecution("session is closed".to_string())
}

impl DbSession for MySqlSession {
    fn close(&mut self) -> Result<()> {
        // dropping the pooled connection hands it back to the pool
        self.conn.take().map(|_| ()).ok_or_else(closed)
    }
}

impl Session for MySqlSession {
    fn execute(&mut self, query: &str) -> Result<()> {
        let conn = self.conn.as_mut().ok_or_else(closed)?;
        let mut result = conn.query_iter(query)?;

        let (columns, column_types): (Vec<_>, Vec<_>) = result
            .columns()
            .as_ref()
            .iter()
            .map(|column| {
                let description = ColumnDescription::new(column.name_str())
                    .with_type(format!("{:?}", column.column_type()));
                (description, column.column_type())
            })
            .unzip();

        // the text protocol ties rows to the connection; buffer them so the
        // stream outlives the session and convert lazily
        let rows = result.by_ref().collect::<std::result::Result<Vec<_>, _>>()?;

        self.columns = columns;
        self.column_types = column_types;
        self.rows = rows;
        Ok(())
    }

    fn columns(&self) -> &[ColumnDescription] {
        &self.columns
    }

    fn take_result_set(&mut self) -> RowStream {
        let rows = std::mem::take(&mut self.rows);
        let types = self.column_types.clone();
        Box::new(rows.into_iter().map(move |row| convert_row(row, &types)))
    }
}

fn convert_row(row: mysql::Row, types: &[ColumnType]) -> Result<Row> {
    row.unwrap_raw()
        .into_iter()
        .zip(types)
        .map(|(value, column_type)| match value {
            Some(value) => convert_value(value, *column_type),
            None => Ok(Value::Null),
        })
        .collect()
}

fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

pub(crate) fn convert_value(value: mysql::Value, column_type: ColumnType) -> Result<Value> {
    use mysql::Value as MyValue;

    Ok(match value {
        MyValue::NULL => Value::Null,
        MyValue::Int(i) => Value::Int64(i),
        MyValue::UInt(u) => i64::try_from(u)
            .map(Value::Int64)
            .unwrap_or(Value::Float64(u as f64)),
        MyValue::Float(f) => Value::Float64(f as f64),
        MyValue::Double(d) => Value::Float64(d),
        MyValue::Date(year, month, day, hour, minute, second, micros) => {
            NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32)
                .and_then(|date| {
                    date.and_hms_micro_opt(hour as u32, minute as u32, second as u32, micros)
                })
                .map(Value::Timestamp)
                .ok_or_else(|| {
                    Error::BackendExecution(format!(
                        "invalid date {}-{}-{} {}:{}:{}.{}",
                        year, month, day, hour, minute, second, micros
                    ))
                })?
        }
        MyValue::Time(negative, days, hours, minutes, seconds, micros) => Value::Utf8(format!(
            "{}{} {:02}:{:02}:{:02}.{:06}",
            if negative { "-" } else { "" },
            days,
            hours,
            minutes,
            seconds,
            micros
        )),
        MyValue::Bytes(bytes) => {
            let text = match String::from_utf8(bytes) {
                Ok(text) => text,
                // binary cells are kept verbatim as hex
                Err(e) => return Ok(Value::Utf8(hex_literal(e.as_bytes()))),
            };
            match column_type {
                ColumnType::MYSQL_TYPE_TINY
                | ColumnType::MYSQL_TYPE_SHORT
                | ColumnType::MYSQL_TYPE_LONG
                | ColumnType::MYSQL_TYPE_INT24
                | ColumnType::MYSQL_TYPE_LONGLONG
                | ColumnType::MYSQL_TYPE_YEAR => {
                    text.parse::<i64>().map(Value::Int64).unwrap_or(Value::Utf8(text))
                }
                ColumnType::MYSQL_TYPE_FLOAT
                | ColumnType::MYSQL_TYPE_DOUBLE
                | ColumnType::MYSQL_TYPE_DECIMAL
                | ColumnType::MYSQL_TYPE_NEWDECIMAL => {
                    text.parse::<f64>().map(Value::Float64).unwrap_or(Value::Utf8(text))
                }
                ColumnType::MYSQL_TYPE_DATE
                | ColumnType::MYSQL_TYPE_NEWDATE
                | ColumnType::MYSQL_TYPE_DATETIME
                | ColumnType::MYSQL_TYPE_DATETIME2
                | ColumnType::MYSQL_TYPE_TIMESTAMP
                | ColumnType::MYSQL_TYPE_TIMESTAMP2 => match parse_datetime(&text) {
                    Some(ts) => Value::Timestamp(ts),
                    None => Value::Utf8(text),
                },
                _ => Value::Utf8(text),
            }
        }
    })
}

fn hex_literal(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(2 + bytes.len() * 2);
    out.push_str("0x");
    for byte in bytes {
        out.push_str(&format!("{:02x}", byte));
    }
    out
}

/// Quote an identifier for MySQL, doubling embedded backticks
pub(crate) fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Sink writing stored batches into MySQL tables
#[derive(Clone)]
pub struct MySqlSink {
    pool: Pool,
}

impl MySqlSink {
    pub fn connect(url: &str) -> Result<Self> {
        Ok(Self { pool: Pool::new(url)? })
    }

    pub fn from_pool(pool: Pool) -> Self {
        Self { pool }
    }
}

impl Sink for MySqlSink {
    fn create_session(&self) -> Result<Box<dyn SinkSession>> {
        Ok(Box::new(MySqlSinkSession {
            conn: Some(self.pool.get_conn()?),
        }))
    }
}

struct MySqlSinkSession {
    conn: Option<PooledConn>,
}

impl DbSession for MySqlSinkSession {
    fn close(&mut self) -> Result<()> {
        self.conn.take().map(|_| ()).ok_or_else(closed)
    }
}

fn sql_type(kind: ColumnKind) -> &'static str {
    match kind {
        ColumnKind::TimeUuid => "CHAR(36)",
        ColumnKind::Text => "TEXT",
        ColumnKind::Integer => "BIGINT",
        ColumnKind::Double => "DOUBLE",
        ColumnKind::Timestamp => "DATETIME(6)",
    }
}

fn qualified_ident(entity: &TimeseriesEntity) -> String {
    format!("{}.{}", quote_ident(&entity.keyspace), quote_ident(&entity.table_name))
}

pub(crate) fn create_table_statement(entity: &TimeseriesEntity) -> String {
    let mut definitions: Vec<String> = entity
        .columns
        .iter()
        .map(|column| {
            let nullability = if column.role == KeyRole::Regular { "NULL" } else { "NOT NULL" };
            format!("{} {} {}", quote_ident(&column.name), sql_type(column.kind), nullability)
        })
        .collect();

    let keys: Vec<String> = entity
        .partition_columns()
        .chain(entity.clustering_columns())
        .map(|column| quote_ident(&column.name))
        .collect();
    definitions.push(format!("PRIMARY KEY ({})", keys.join(", ")));

    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        qualified_ident(entity),
        definitions.join(", ")
    )
}

fn cell(array: &ArrayRef, kind: ColumnKind, row: usize) -> mysql::Value {
    if array.is_null(row) {
        return mysql::Value::NULL;
    }
    match kind {
        ColumnKind::TimeUuid | ColumnKind::Text => {
            mysql::Value::from(array.as_string::<i32>().value(row))
        }
        ColumnKind::Integer => mysql::Value::from(array.as_primitive::<Int64Type>().value(row)),
        ColumnKind::Double => mysql::Value::from(array.as_primitive::<Float64Type>().value(row)),
        ColumnKind::Timestamp => {
            let micros = array.as_primitive::<TimestampMicrosecondType>().value(row);
            match DateTime::from_timestamp_micros(micros) {
                Some(dt) => {
                    mysql::Value::from(dt.naive_utc().format("%Y-%m-%d %H:%M:%S%.6f").to_string())
                }
                None => mysql::Value::NULL,
            }
        }
    }
}

impl SinkSession for MySqlSinkSession {
    fn list_tables(&mut self, keyspace: &str) -> Result<Vec<String>> {
        let conn = self.conn.as_mut().ok_or_else(closed)?;
        let tables = conn.exec_map(
            "SELECT table_name FROM information_schema.tables WHERE table_schema = ?",
            (keyspace,),
            |(table_name,): (String,)| table_name,
        )?;
        Ok(tables)
    }

    fn create_schema(&mut self, entity: &TimeseriesEntity) -> Result<()> {
        let conn = self.conn.as_mut().ok_or_else(closed)?;
        let keyspace = quote_ident(&entity.keyspace);
        conn.query_drop(format!("CREATE DATABASE IF NOT EXISTS {}", keyspace))?;

        let statement = create_table_statement(entity);
        log::debug!("{}", statement);
        conn.query_drop(statement)?;
        Ok(())
    }

    fn insert(
        &mut self,
        batch: &RecordBatch,
        entity: &TimeseriesEntity,
        batch_id: Uuid,
        sub_batch_size: usize,
    ) -> Result<usize> {
        let conn = self.conn.as_mut().ok_or_else(closed)?;

        let mut columns: Vec<(Option<ArrayRef>, ColumnKind)> =
            Vec::with_capacity(entity.columns.len());
        for column in &entity.columns {
            match &column.source {
                None => columns.push((None, column.kind)),
                Some(source) => {
                    let array = batch.column_by_name(source).ok_or_else(|| {
                        Error::Sink(format!("column '{}' missing from batch", source))
                    })?;
                    columns.push((Some(normalize_column(array, column.kind)?), column.kind));
                }
            }
        }

        let names: Vec<String> = entity.columns.iter().map(|c| quote_ident(&c.name)).collect();
        let placeholder = format!("({})", vec!["?"; names.len()].join(", "));
        let id = batch_id.to_string();

        // rows sharing a primary key overwrite each other, as in a wide-column store
        let mut tx = conn.start_transaction(TxOpts::default())?;
        let num_rows = batch.num_rows();
        let size = sub_batch_size.max(1);
        let mut offset = 0;
        while offset < num_rows {
            let len = size.min(num_rows - offset);
            let mut params: Vec<mysql::Value> = Vec::with_capacity(len * names.len());
            for row in offset..offset + len {
                for (array, kind) in &columns {
                    params.push(match array {
                        None => mysql::Value::from(id.as_str()),
                        Some(array) => cell(array, *kind, row),
                    });
                }
            }

            let query = format!(
                "REPLACE INTO {} ({}) VALUES {}",
                qualified_ident(entity),
                names.join(", "),
                vec![placeholder.as_str(); len].join(",")
            );
            tx.exec_drop(&query, params)?;
            offset += len;
        }
        tx.commit()?;

        Ok(num_rows)
    }
}
