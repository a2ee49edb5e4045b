use chrono::NaiveDate;

use super::*;

fn ts(h: u32, m: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2019, 1, 1)
        .unwrap()
        .and_hms_opt(h, m, s)
        .unwrap()
}

#[test]
fn test_data_points_query_without_bounds() {
    let params = QueryParams::data_points("DataPoint", 1, TimeRange::unbounded(), None);
    let query = SqlQueryBuilder.build(&params);

    assert_eq!(query, "SELECT * FROM DataPoint WHERE TID = 1 LIMIT NULL");
}

#[test]
fn test_data_points_query_with_range_and_limit() {
    let range = TimeRange::new(Some(ts(0, 0, 2)), Some(ts(0, 0, 6)));
    let params = QueryParams::data_points("DataPoint", 3, range, Some(3));
    let query = SqlQueryBuilder.build(&params);

    assert_eq!(
        query,
        "SELECT * FROM DataPoint WHERE TID = 3 \
         AND TIMESTAMP >= '2019-01-01 00:00:02.000' \
         AND TIMESTAMP <= '2019-01-01 00:00:06.000' LIMIT 3"
    );
}

#[test]
fn test_segment_query_uses_segment_time_columns() {
    let range = TimeRange::new(Some(ts(1, 0, 0)), Some(ts(2, 0, 0)));
    let params = QueryParams::segments("Segment", 2, range, None);
    let query = SqlQueryBuilder.build(&params);

    assert!(query.starts_with("SELECT * FROM Segment WHERE TID = 2"));
    assert!(query.contains("START_TIME >= '2019-01-01 01:00:00.000'"));
    assert!(query.contains("END_TIME <= '2019-01-01 02:00:00.000'"));
    assert!(query.ends_with("LIMIT NULL"));
}

#[test]
fn test_model_table_query() {
    let params = QueryParams::model_table("wind_turbine", TimeRange::unbounded(), Some(10));
    assert_eq!(
        SqlQueryBuilder.build(&params),
        "SELECT * FROM wind_turbine LIMIT 10"
    );

    let range = TimeRange::new(None, Some(ts(0, 0, 6)));
    let params = QueryParams::model_table("wind_turbine", range, None);
    assert_eq!(
        SqlQueryBuilder.build(&params),
        "SELECT * FROM wind_turbine WHERE datetime <= '2019-01-01 00:00:06.000' LIMIT NULL"
    );
}

#[test]
fn test_ts_id_accessor() {
    let params = QueryParams::segments("Segment", 42, TimeRange::unbounded(), None);
    assert_eq!(params.ts_id(), Some(42));

    let params = QueryParams::model_table("t", TimeRange::unbounded(), None);
    assert_eq!(params.ts_id(), None);
}
