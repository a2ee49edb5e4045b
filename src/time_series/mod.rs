//! Time-series retrieval: query execution, cursor merging and rendering

use std::sync::Arc;

use arrow::record_batch::RecordBatch;
use uuid::Uuid;

use crate::config::FactoryConfig;
use crate::errors::{Error, Result};
use crate::persistence::{
    ScopedSession, Session, SessionProvider, Sink, SinkSession, TimeseriesEntity,
};
use crate::query::{QueryBuilder, QueryParams, SqlQueryBuilder, TimeRange};

mod accessors;
mod cursor;
mod merge;
mod result;
mod scalar_value;

#[cfg(test)]
mod tests;

pub use accessors::{
    Accessor, FetchType, PartitionedTable, RenderOptions, Rendered, render, to_distributed,
    to_json, to_tabular,
};
pub use cursor::{CursorState, RowStream, SeriesCursor};
pub use merge::{Frame, TIME_SERIES_ID_LABEL, merge_frames, outer_join};
pub use result::{Batches, Timeseries};
pub use scalar_value::{Row, Value, column_to_array, infer_data_type};

/// Value column every data-point query returns before relabeling
pub const DEFAULT_VALUE_LABEL: &str = "VALUE";

pub const TIMESTAMP_LABEL: &str = "TIMESTAMP";

/// Key series fetched by id are usually aligned on
pub const DEFAULT_MERGE_KEY: &str = TIMESTAMP_LABEL;

/// Builds queries, runs them through the configured source and wraps the
/// resulting cursors into [`Timeseries`] handles. Also stores batches into
/// the configured sink.
pub struct TimeseriesFactory {
    source: Option<Arc<dyn SessionProvider>>,
    sink: Option<Arc<dyn Sink>>,
    query_builder: Arc<dyn QueryBuilder>,
    config: FactoryConfig,
}

impl TimeseriesFactory {
    pub fn new(config: FactoryConfig) -> Self {
        Self {
            source: None,
            sink: None,
            query_builder: Arc::new(SqlQueryBuilder),
            config,
        }
    }

    pub fn with_source(mut self, source: Arc<dyn SessionProvider>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn Sink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_query_builder(mut self, query_builder: Arc<dyn QueryBuilder>) -> Self {
        self.query_builder = query_builder;
        self
    }

    pub fn config(&self) -> &FactoryConfig {
        &self.config
    }

    fn render_options(&self) -> RenderOptions {
        RenderOptions {
            partitions: self.config.partitions,
        }
    }

    /// Run one query in its own session and capture its result as a cursor.
    ///
    /// The session is closed on every path. A backend that sends back no
    /// column metadata at all is a null response, unlike an empty result.
    fn execute(&self, params: &QueryParams, value_label: Option<&str>) -> Result<SeriesCursor> {
        let source = self.source.as_ref().ok_or_else(|| {
            Error::InvalidArgument("no source configured for retrieval".to_string())
        })?;

        let query = self.query_builder.build(params);
        log::debug!("Executing query: {}", query);

        let mut session = ScopedSession::new(source.create_session()?);
        if let Err(e) = session.execute(&query) {
            log::error!("Query failed: {}: {}", query, e);
            return Err(e);
        }

        if session.columns().is_empty() {
            return Err(Error::NullResponse(query));
        }

        let columns: Vec<String> = session
            .columns()
            .iter()
            .map(|column| match value_label {
                Some(label) if column.name == DEFAULT_VALUE_LABEL => label.to_string(),
                _ => column.name.clone(),
            })
            .collect();
        let rows = session.take_result_set();
        session.release()?;

        Ok(SeriesCursor::new(columns, rows))
    }

    /// Whole model table, optionally bounded in time and row count
    pub fn create_time_series(
        &self,
        model_table: &str,
        time_range: TimeRange,
        limit: Option<u64>,
    ) -> Result<Timeseries> {
        if model_table.trim().is_empty() {
            return Err(Error::InvalidArgument(
                "model table name must not be empty".to_string(),
            ));
        }

        let params = QueryParams::model_table(model_table, time_range, limit);
        let cursor = self.execute(&params, None)?;
        let columns = cursor.columns().to_vec();

        Ok(Timeseries::new(vec![cursor], None)
            .with_columns(columns)
            .with_render_options(self.render_options()))
    }

    /// Raw data points of each series id, in the given order.
    ///
    /// Cursors are outer-joined on `merge_on`, each value column renamed to
    /// the matching entry of `value_column_labels` or `VALUE_<id>` without
    /// labels. When `merge_on` is `None` the cursors are stacked, so they
    /// must share one value column: it keeps the name `VALUE` unless every
    /// label is the same.
    pub fn create_time_series_from_ts_ids(
        &self,
        ts_ids: &[i64],
        time_range: TimeRange,
        merge_on: Option<&str>,
        value_column_labels: Option<&[&str]>,
        limit: Option<u64>,
    ) -> Result<Timeseries> {
        if let Some(labels) = value_column_labels {
            if labels.len() != ts_ids.len() {
                return Err(Error::InvalidArgument(format!(
                    "expected {} value column labels, got {}",
                    ts_ids.len(),
                    labels.len()
                )));
            }
            if let Some(position) = labels.iter().position(|label| label.trim().is_empty()) {
                return Err(Error::InvalidArgument(format!(
                    "value column label at position {} is empty",
                    position
                )));
            }
            if merge_on.is_none() && labels.windows(2).any(|pair| pair[0] != pair[1]) {
                return Err(Error::InvalidArgument(
                    "stacked series must share one value column label".to_string(),
                ));
            }
        }

        let mut cursors = Vec::with_capacity(ts_ids.len());
        for (i, &ts_id) in ts_ids.iter().enumerate() {
            let label = match (value_column_labels, merge_on) {
                (Some(labels), _) => Some(labels[i].to_string()),
                (None, Some(_)) => Some(format!("{}_{}", DEFAULT_VALUE_LABEL, ts_id)),
                (None, None) => None,
            };
            let params = QueryParams::data_points(
                &self.config.data_point_schema,
                ts_id,
                time_range,
                limit,
            );
            cursors.push(self.execute(&params, label.as_deref())?);
        }

        Ok(Timeseries::new(cursors, merge_on).with_render_options(self.render_options()))
    }

    /// Compressed segments of each series id, stacked in the given order
    pub fn create_time_series_data_models_from_ts_ids(
        &self,
        ts_ids: &[i64],
        time_range: TimeRange,
        limit: Option<u64>,
    ) -> Result<Timeseries> {
        let mut cursors = Vec::with_capacity(ts_ids.len());
        for &ts_id in ts_ids {
            let params =
                QueryParams::segments(&self.config.segment_schema, ts_id, time_range, limit);
            cursors.push(self.execute(&params, None)?);
        }

        Ok(Timeseries::new(cursors, None).with_render_options(self.render_options()))
    }

    /// Store `batch` into the sink under `namespace` (the configured keyspace
    /// when `None`), creating the backing table on first use.
    ///
    /// Returns the id generated for the stored batch.
    pub fn store_time_series(&self, batch: &RecordBatch, namespace: Option<&str>) -> Result<Uuid> {
        let sink = self.sink.as_ref().ok_or_else(|| {
            Error::InvalidArgument("no sink configured for storage".to_string())
        })?;

        let keyspace = namespace.unwrap_or(&self.config.keyspace);
        let entity =
            TimeseriesEntity::from_schema(&batch.schema(), keyspace, &self.config.table_name)?;

        let mut session = ScopedSession::new(sink.create_session()?);
        let exists = session
            .list_tables(keyspace)?
            .iter()
            .any(|table| table.eq_ignore_ascii_case(&entity.table_name));
        if !exists {
            session.create_schema(&entity)?;
            log::info!("Created table {}", entity.qualified_name());
        }

        let batch_id = Uuid::now_v7();
        let inserted = session.insert(batch, &entity, batch_id, self.config.insert_batch_size)?;
        session.release()?;

        log::info!(
            "Stored {} rows into {} as {}",
            inserted,
            entity.qualified_name(),
            batch_id
        );
        Ok(batch_id)
    }
}
