//! Backend collaborators: query sessions, sinks and their adapters

use std::ops::{Deref, DerefMut};

use arrow::record_batch::RecordBatch;
use uuid::Uuid;

use crate::errors::Result;
use crate::time_series::RowStream;

mod entity;
mod memory;
mod model_table;
mod mysql_backend;

#[cfg(test)]
mod tests;

pub use entity::{ColumnKind, EntityColumn, KeyRole, TIME_SERIES_ID_COLUMN, TimeseriesEntity};
pub use memory::{MemorySink, SinkStats};
pub use model_table::{FlushMode, ModelSink, ModelTable};
pub use mysql_backend::{MySqlSink, MySqlSource};

/// Column metadata reported by a backend after executing a query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescription {
    pub name: String,
    pub type_name: Option<String>,
}

impl ColumnDescription {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: None,
        }
    }

    pub fn with_type(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }
}

/// Anything holding a backend handle that must be given back
pub trait DbSession: Send {
    fn close(&mut self) -> Result<()>;
}

/// One query execution against a source backend
pub trait Session: DbSession {
    fn execute(&mut self, query: &str) -> Result<()>;

    /// Columns of the last executed query; empty when the backend sent none
    fn columns(&self) -> &[ColumnDescription];

    /// Hand over the rows of the last executed query. The stream must stay
    /// readable after the session is closed.
    fn take_result_set(&mut self) -> RowStream;
}

pub trait SessionProvider: Send + Sync {
    fn create_session(&self) -> Result<Box<dyn Session>>;
}

/// Write side of a storage backend
pub trait SinkSession: DbSession {
    fn list_tables(&mut self, keyspace: &str) -> Result<Vec<String>>;

    fn create_schema(&mut self, entity: &TimeseriesEntity) -> Result<()>;

    /// Insert every row of `batch` under `batch_id`, `sub_batch_size` rows at
    /// a time. Returns the number of rows written.
    fn insert(
        &mut self,
        batch: &RecordBatch,
        entity: &TimeseriesEntity,
        batch_id: Uuid,
        sub_batch_size: usize,
    ) -> Result<usize>;
}

pub trait Sink: Send + Sync {
    fn create_session(&self) -> Result<Box<dyn SinkSession>>;
}

/// Closes the wrapped session exactly once: through [`ScopedSession::release`],
/// or when dropped on an early-return path.
pub struct ScopedSession<S: DbSession + ?Sized> {
    inner: Box<S>,
    closed: bool,
}

impl<S: DbSession + ?Sized> ScopedSession<S> {
    pub fn new(session: Box<S>) -> Self {
        Self {
            inner: session,
            closed: false,
        }
    }

    pub fn release(mut self) -> Result<()> {
        self.closed = true;
        self.inner.close()
    }
}

impl<S: DbSession + ?Sized> Deref for ScopedSession<S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.inner
    }
}

impl<S: DbSession + ?Sized> DerefMut for ScopedSession<S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut self.inner
    }
}

impl<S: DbSession + ?Sized> Drop for ScopedSession<S> {
    fn drop(&mut self) {
        if !self.closed {
            self.closed = true;
            if let Err(e) = self.inner.close() {
                log::warn!("Failed to close session: {}", e);
            }
        }
    }
}
