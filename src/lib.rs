//! Uniform time-series retrieval over heterogeneous backends.
//!
//! Queries are built per series id or model table, executed through a
//! [`persistence::SessionProvider`] and captured as lazy cursors. A
//! [`Timeseries`] merges its cursors on a key column (or stacks them) and
//! renders the result as JSON, an arrow [`arrow::record_batch::RecordBatch`]
//! or a row-partitioned table. Batches are stored through a
//! [`persistence::Sink`].

mod config;
mod errors;
pub mod persistence;
pub mod query;
pub mod time_series;

pub use config::FactoryConfig;
pub use errors::{Error, Result};
pub use query::{QueryBuilder, QueryParams, SqlQueryBuilder, TimeRange};
pub use time_series::{
    DEFAULT_MERGE_KEY, FetchType, Rendered, SeriesCursor, Timeseries, TimeseriesFactory, Value,
};
