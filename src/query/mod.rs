//! Query parameter mappings and their rendering into backend query strings

use chrono::NaiveDateTime;

#[cfg(test)]
mod tests;

const QUERY_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Marker rendered when no row limit was requested
pub const NO_LIMIT: &str = "NULL";

/// Inclusive time bounds; either side may be open
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeRange {
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
}

impl TimeRange {
    pub fn new(start: Option<NaiveDateTime>, end: Option<NaiveDateTime>) -> Self {
        Self { start, end }
    }

    pub fn unbounded() -> Self {
        Self::default()
    }
}

/// What a query reads from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryTarget {
    /// One series id inside a schema (data points or segments)
    Series { schema: String, ts_id: i64 },
    /// A whole model table
    ModelTable(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryParams {
    pub target: QueryTarget,
    pub start_time_column: String,
    pub end_time_column: String,
    pub time_range: TimeRange,
    pub limit: Option<u64>,
}

impl QueryParams {
    pub fn data_points(
        schema: &str,
        ts_id: i64,
        time_range: TimeRange,
        limit: Option<u64>,
    ) -> Self {
        Self {
            target: QueryTarget::Series { schema: schema.to_string(), ts_id },
            start_time_column: "TIMESTAMP".to_string(),
            end_time_column: "TIMESTAMP".to_string(),
            time_range,
            limit,
        }
    }

    pub fn segments(schema: &str, ts_id: i64, time_range: TimeRange, limit: Option<u64>) -> Self {
        Self {
            target: QueryTarget::Series { schema: schema.to_string(), ts_id },
            start_time_column: "START_TIME".to_string(),
            end_time_column: "END_TIME".to_string(),
            time_range,
            limit,
        }
    }

    pub fn model_table(table: &str, time_range: TimeRange, limit: Option<u64>) -> Self {
        Self {
            target: QueryTarget::ModelTable(table.to_string()),
            start_time_column: "datetime".to_string(),
            end_time_column: "datetime".to_string(),
            time_range,
            limit,
        }
    }

    /// Series id this query is scoped to, if any
    pub fn ts_id(&self) -> Option<i64> {
        match &self.target {
            QueryTarget::Series { ts_id, .. } => Some(*ts_id),
            QueryTarget::ModelTable(_) => None,
        }
    }

    fn time_predicates(&self) -> Vec<String> {
        let mut predicates = Vec::with_capacity(2);
        if let Some(start) = self.time_range.start {
            predicates.push(format!(
                "{} >= '{}'",
                self.start_time_column,
                start.format(QUERY_TIME_FORMAT)
            ));
        }
        if let Some(end) = self.time_range.end {
            predicates.push(format!(
                "{} <= '{}'",
                self.end_time_column,
                end.format(QUERY_TIME_FORMAT)
            ));
        }
        predicates
    }

    fn limit_clause(&self) -> String {
        match self.limit {
            Some(limit) => format!("LIMIT {}", limit),
            None => format!("LIMIT {}", NO_LIMIT),
        }
    }
}

/// Turns a parameter mapping into a backend query string
pub trait QueryBuilder: Send + Sync {
    fn build(&self, params: &QueryParams) -> String;
}

/// SQL dialect shared by the column-oriented and wide-column backends
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlQueryBuilder;

impl QueryBuilder for SqlQueryBuilder {
    fn build(&self, params: &QueryParams) -> String {
        let predicates = params.time_predicates();

        let mut query = match &params.target {
            QueryTarget::Series { schema, ts_id } => {
                let mut query = format!("SELECT * FROM {} WHERE TID = {}", schema, ts_id);
                for predicate in &predicates {
                    query.push_str(" AND ");
                    query.push_str(predicate);
                }
                query
            }
            QueryTarget::ModelTable(table) => {
                let mut query = format!("SELECT * FROM {}", table);
                if !predicates.is_empty() {
                    query.push_str(" WHERE ");
                    query.push_str(&predicates.join(" AND "));
                }
                query
            }
        };

        query.push(' ');
        query.push_str(&params.limit_clause());
        query
    }
}
