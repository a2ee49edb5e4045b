use std::collections::BTreeMap;
use std::sync::Arc;

use arrow::array::{ArrayRef, StringArray};
use arrow::record_batch::RecordBatch;
use parking_lot::Mutex;
use uuid::Uuid;

use super::entity::normalize_column;
use super::model_table::{FlushMode, ModelSink};
use super::{DbSession, Sink, SinkSession, TimeseriesEntity};
use crate::errors::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SinkStats {
    pub schemas_created: usize,
    pub rows_inserted: usize,
    pub sub_batches: usize,
    pub sessions_opened: usize,
    pub sessions_closed: usize,
    pub flushes: usize,
}

#[derive(Debug)]
struct StoredTable {
    entity: TimeseriesEntity,
    batches: Vec<RecordBatch>,
}

#[derive(Debug, Default)]
struct SinkState {
    // keyspace -> table name -> table
    keyspaces: BTreeMap<String, BTreeMap<String, StoredTable>>,
    model_tables: BTreeMap<String, Vec<RecordBatch>>,
    stats: SinkStats,
}

/// In-process sink keeping stored batches in memory
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    state: Arc<Mutex<SinkState>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> SinkStats {
        self.state.lock().stats.clone()
    }

    pub fn tables(&self, keyspace: &str) -> Vec<String> {
        let state = self.state.lock();
        state
            .keyspaces
            .get(keyspace)
            .map(|tables| tables.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn entity(&self, keyspace: &str, table: &str) -> Option<TimeseriesEntity> {
        let state = self.state.lock();
        state
            .keyspaces
            .get(keyspace)
            .and_then(|tables| tables.get(table))
            .map(|t| t.entity.clone())
    }

    /// Stored sub-batches of a table, in insertion order
    pub fn batches(&self, keyspace: &str, table: &str) -> Vec<RecordBatch> {
        let state = self.state.lock();
        state
            .keyspaces
            .get(keyspace)
            .and_then(|tables| tables.get(table))
            .map(|t| t.batches.clone())
            .unwrap_or_default()
    }

    pub fn row_count(&self, keyspace: &str, table: &str) -> usize {
        self.batches(keyspace, table)
            .iter()
            .map(RecordBatch::num_rows)
            .sum()
    }

    pub fn model_table_rows(&self, table: &str) -> Option<usize> {
        let state = self.state.lock();
        state
            .model_tables
            .get(table)
            .map(|batches| batches.iter().map(RecordBatch::num_rows).sum())
    }
}

impl Sink for MemorySink {
    fn create_session(&self) -> Result<Box<dyn SinkSession>> {
        self.state.lock().stats.sessions_opened += 1;
        Ok(Box::new(MemorySinkSession {
            state: Arc::clone(&self.state),
            closed: false,
        }))
    }
}

struct MemorySinkSession {
    state: Arc<Mutex<SinkState>>,
    closed: bool,
}

impl MemorySinkSession {
    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(Error::Sink("session is closed".to_string()));
        }
        Ok(())
    }
}

impl DbSession for MemorySinkSession {
    fn close(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.closed = true;
        self.state.lock().stats.sessions_closed += 1;
        Ok(())
    }
}

impl SinkSession for MemorySinkSession {
    fn list_tables(&mut self, keyspace: &str) -> Result<Vec<String>> {
        self.ensure_open()?;
        let state = self.state.lock();
        Ok(state
            .keyspaces
            .get(keyspace)
            .map(|tables| tables.keys().cloned().collect())
            .unwrap_or_default())
    }

    fn create_schema(&mut self, entity: &TimeseriesEntity) -> Result<()> {
        self.ensure_open()?;
        let mut state = self.state.lock();
        let tables = state.keyspaces.entry(entity.keyspace.clone()).or_default();
        if tables.contains_key(&entity.table_name) {
            return Ok(());
        }
        tables.insert(
            entity.table_name.clone(),
            StoredTable {
                entity: entity.clone(),
                batches: Vec::new(),
            },
        );
        state.stats.schemas_created += 1;
        Ok(())
    }

    fn insert(
        &mut self,
        batch: &RecordBatch,
        entity: &TimeseriesEntity,
        batch_id: Uuid,
        sub_batch_size: usize,
    ) -> Result<usize> {
        self.ensure_open()?;

        let id = batch_id.to_string();
        let mut columns: Vec<ArrayRef> = Vec::with_capacity(entity.columns.len());
        for column in &entity.columns {
            match &column.source {
                None => {
                    let ids = vec![id.as_str(); batch.num_rows()];
                    columns.push(Arc::new(StringArray::from(ids)));
                }
                Some(source) => {
                    let array = batch.column_by_name(source).ok_or_else(|| {
                        Error::Sink(format!("column '{}' missing from batch", source))
                    })?;
                    columns.push(normalize_column(array, column.kind)?);
                }
            }
        }
        let stamped = RecordBatch::try_new(entity.storage_schema(), columns)?;

        let mut state = self.state.lock();
        let table = state
            .keyspaces
            .get_mut(&entity.keyspace)
            .and_then(|tables| tables.get_mut(&entity.table_name))
            .ok_or_else(|| {
                Error::Sink(format!("table {} does not exist", entity.qualified_name()))
            })?;

        let size = sub_batch_size.max(1);
        let mut offset = 0;
        let mut sub_batches = 0;
        while offset < stamped.num_rows() {
            let len = size.min(stamped.num_rows() - offset);
            table.batches.push(stamped.slice(offset, len));
            offset += len;
            sub_batches += 1;
        }

        state.stats.rows_inserted += stamped.num_rows();
        state.stats.sub_batches += sub_batches;
        Ok(stamped.num_rows())
    }
}

impl ModelSink for MemorySink {
    fn list_tables(&self) -> Result<Vec<String>> {
        Ok(self.state.lock().model_tables.keys().cloned().collect())
    }

    fn execute_statement(&self, statement: &str) -> Result<()> {
        let name = statement
            .strip_prefix("CREATE MODEL TABLE ")
            .and_then(|rest| rest.split(|c: char| c == '(' || c.is_whitespace()).next())
            .filter(|name| !name.is_empty())
            .ok_or_else(|| Error::Sink(format!("unsupported statement: {}", statement)))?;

        let mut state = self.state.lock();
        state.model_tables.entry(name.to_string()).or_default();
        state.stats.schemas_created += 1;
        Ok(())
    }

    fn insert(&self, table: &str, batch: &RecordBatch) -> Result<()> {
        let mut state = self.state.lock();
        let batches = state
            .model_tables
            .get_mut(table)
            .ok_or_else(|| Error::Sink(format!("model table {} does not exist", table)))?;
        batches.push(batch.clone());
        state.stats.rows_inserted += batch.num_rows();
        Ok(())
    }

    fn flush(&self, mode: FlushMode) -> Result<()> {
        log::debug!("{} requested on in-memory sink", mode);
        self.state.lock().stats.flushes += 1;
        Ok(())
    }
}
