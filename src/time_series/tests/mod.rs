pub mod factory;

use super::*;
use crate::errors::Error;
use crate::persistence::{ColumnDescription, DbSession, Session};
use chrono::{NaiveDate, NaiveDateTime};
use parking_lot::Mutex;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn ts(h: u32, m: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2019, 1, 1)
        .unwrap()
        .and_hms_opt(h, m, s)
        .unwrap()
}

pub fn names(columns: &[&str]) -> Vec<String> {
    columns.iter().map(|c| c.to_string()).collect()
}

/// Rows of one series as the data point schema returns them:
/// `TID, TIMESTAMP, VALUE`, one row per second starting at `first_second`
pub fn data_points(tid: i64, first_second: u32, values: &[f64]) -> Vec<Row> {
    values
        .iter()
        .enumerate()
        .map(|(i, v)| {
            vec![
                Value::Int64(tid),
                Value::Timestamp(ts(0, 0, first_second + i as u32)),
                Value::Float64(*v),
            ]
        })
        .collect()
}

pub fn series_cursor(columns: &[&str], rows: Vec<Row>) -> SeriesCursor {
    SeriesCursor::from_rows(names(columns), rows)
}

#[derive(Clone)]
pub enum Response {
    Rows(Vec<String>, Vec<Row>),
    /// Executes fine but reports no column metadata
    Null,
    Fail(String),
}

#[derive(Default)]
struct SourceState {
    queries: Vec<String>,
    opened: usize,
    closed: usize,
}

/// Source answering each query with the first scripted response whose
/// pattern the query contains
#[derive(Default)]
pub struct ScriptedSource {
    script: Vec<(String, Response)>,
    state: Arc<Mutex<SourceState>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, pattern: &str, response: Response) -> Self {
        self.script.push((pattern.to_string(), response));
        self
    }

    /// Data points of series `tid`, matched on the `TID = <tid>` predicate
    pub fn series(self, tid: i64, first_second: u32, values: &[f64]) -> Self {
        let pattern = format!("TID = {} ", tid);
        let response = Response::Rows(
            names(&["TID", "TIMESTAMP", "VALUE"]),
            data_points(tid, first_second, values),
        );
        self.on(&pattern, response)
    }

    pub fn queries(&self) -> Vec<String> {
        self.state.lock().queries.clone()
    }

    pub fn sessions(&self) -> (usize, usize) {
        let state = self.state.lock();
        (state.opened, state.closed)
    }
}

impl SessionProvider for ScriptedSource {
    fn create_session(&self) -> crate::errors::Result<Box<dyn Session>> {
        self.state.lock().opened += 1;
        Ok(Box::new(ScriptedSession {
            script: self.script.clone(),
            state: Arc::clone(&self.state),
            columns: Vec::new(),
            rows: Vec::new(),
        }))
    }
}

struct ScriptedSession {
    script: Vec<(String, Response)>,
    state: Arc<Mutex<SourceState>>,
    columns: Vec<ColumnDescription>,
    rows: Vec<Row>,
}

impl DbSession for ScriptedSession {
    fn close(&mut self) -> crate::errors::Result<()> {
        self.state.lock().closed += 1;
        Ok(())
    }
}

impl Session for ScriptedSession {
    fn execute(&mut self, query: &str) -> crate::errors::Result<()> {
        self.state.lock().queries.push(query.to_string());

        let response = self
            .script
            .iter()
            .find(|(pattern, _)| query.contains(pattern.as_str()))
            .map(|(_, response)| response.clone())
            .unwrap_or(Response::Null);

        match response {
            Response::Rows(columns, rows) => {
                self.columns = columns.into_iter().map(ColumnDescription::new).collect();
                self.rows = rows;
                Ok(())
            }
            Response::Null => Ok(()),
            Response::Fail(msg) => Err(Error::BackendExecution(msg)),
        }
    }

    fn columns(&self) -> &[ColumnDescription] {
        &self.columns
    }

    fn take_result_set(&mut self) -> RowStream {
        Box::new(std::mem::take(&mut self.rows).into_iter().map(Ok))
    }
}

pub fn factory(source: &Arc<ScriptedSource>) -> TimeseriesFactory {
    TimeseriesFactory::new(FactoryConfig::default())
        .with_source(Arc::clone(source) as Arc<dyn SessionProvider>)
}

/// Every row of every batch `fetch_next` yields, rendered as tabular
pub fn collect_batches(
    series: &mut Timeseries,
    batch_size: usize,
) -> Vec<arrow::record_batch::RecordBatch> {
    series
        .fetch_next(FetchType::Tabular, batch_size)
        .unwrap()
        .map(|rendered| rendered.unwrap().into_record_batch().unwrap())
        .collect()
}
