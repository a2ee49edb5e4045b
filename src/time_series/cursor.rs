use std::fmt;

use crate::errors::{Error, Result};
use crate::time_series::scalar_value::Row;

/// Lazy, one-way stream of backend rows
pub type RowStream = Box<dyn Iterator<Item = Result<Row>> + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    Open,
    Draining,
    Exhausted,
}

/// Column names plus the lazy row stream of one backend query.
///
/// Draining is destructive: rows handed out are gone, and an exhausted
/// cursor stays exhausted.
pub struct SeriesCursor {
    columns: Vec<String>,
    rows: RowStream,
    state: CursorState,
}

impl fmt::Debug for SeriesCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeriesCursor")
            .field("columns", &self.columns)
            .field("state", &self.state)
            .finish()
    }
}

impl SeriesCursor {
    pub fn new(columns: Vec<String>, rows: RowStream) -> Self {
        Self {
            columns,
            rows,
            state: CursorState::Open,
        }
    }

    /// Cursor over rows already held in memory
    pub fn from_rows(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self::new(columns, Box::new(rows.into_iter().map(Ok)))
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn state(&self) -> CursorState {
        self.state
    }

    pub fn is_exhausted(&self) -> bool {
        self.state == CursorState::Exhausted
    }

    /// Pull up to `limit` rows, or every remaining row when `limit` is `None`.
    ///
    /// An empty result means the cursor is exhausted.
    pub fn drain(&mut self, limit: Option<usize>) -> Result<Vec<Row>> {
        if self.state == CursorState::Exhausted {
            return Ok(Vec::new());
        }
        self.state = CursorState::Draining;

        let mut rows = Vec::with_capacity(limit.unwrap_or(0).min(4096));
        while limit.is_none_or(|limit| rows.len() < limit) {
            match self.rows.next() {
                Some(row) => {
                    let row = row?;
                    if row.len() != self.columns.len() {
                        return Err(Error::RowArity {
                            expected: self.columns.len(),
                            actual: row.len(),
                        });
                    }
                    rows.push(row);
                }
                None => {
                    self.state = CursorState::Exhausted;
                    break;
                }
            }
        }

        Ok(rows)
    }
}
