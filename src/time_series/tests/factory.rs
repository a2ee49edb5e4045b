use super::*;

fn wind_farm() -> Arc<ScriptedSource> {
    Arc::new(
        ScriptedSource::new()
            .series(1, 0, &[110.0, 120.0, 130.0])
            .series(2, 0, &[10.0, 11.0, 12.0])
            .series(3, 0, &[5.0, 5.5, 6.0])
            .series(7, 0, &[0.5, 0.6]),
    )
}

#[test]
fn test_from_ts_ids_with_labels() {
    init_logging();
    let source = wind_farm();
    let factory = factory(&source);

    let mut series = factory
        .create_time_series_from_ts_ids(
            &[1, 2, 3],
            TimeRange::unbounded(),
            Some(DEFAULT_MERGE_KEY),
            Some(&["active power", "rotor speed", "wind speed"][..]),
            None,
        )
        .unwrap();
    let batch = series
        .fetch_all(FetchType::Tabular)
        .unwrap()
        .unwrap()
        .into_record_batch()
        .unwrap();

    assert_eq!(batch.num_rows(), 3);
    assert_eq!(
        series.columns(),
        names(&["TIMESTAMP", "active power", "rotor speed", "wind speed"]).as_slice()
    );
    assert_eq!(
        source.queries(),
        vec![
            "SELECT * FROM DataPoint WHERE TID = 1 LIMIT NULL".to_string(),
            "SELECT * FROM DataPoint WHERE TID = 2 LIMIT NULL".to_string(),
            "SELECT * FROM DataPoint WHERE TID = 3 LIMIT NULL".to_string(),
        ]
    );
    assert_eq!(source.sessions(), (3, 3));
}

#[test]
fn test_default_value_label() {
    let source = wind_farm();
    let mut series = factory(&source)
        .create_time_series_from_ts_ids(
            &[7],
            TimeRange::unbounded(),
            Some(DEFAULT_MERGE_KEY),
            None,
            None,
        )
        .unwrap();
    series.fetch_all(FetchType::Json).unwrap();

    assert_eq!(series.columns(), names(&["TID", "TIMESTAMP", "VALUE_7"]).as_slice());
}

#[test]
fn test_label_count_mismatch_issues_no_query() {
    let source = wind_farm();
    let result = factory(&source).create_time_series_from_ts_ids(
        &[1, 2],
        TimeRange::unbounded(),
        Some(DEFAULT_MERGE_KEY),
        Some(&["a"][..]),
        None,
    );

    assert!(matches!(result, Err(Error::InvalidArgument(_))));
    assert!(source.queries().is_empty());
    assert_eq!(source.sessions(), (0, 0));
}

#[test]
fn test_blank_label_rejected() {
    let source = wind_farm();
    let result = factory(&source).create_time_series_from_ts_ids(
        &[1, 2],
        TimeRange::unbounded(),
        None,
        Some(&["a", " "][..]),
        None,
    );

    assert!(matches!(result, Err(Error::InvalidArgument(_))));
    assert!(source.queries().is_empty());
}

#[test]
fn test_null_response() {
    let source = Arc::new(ScriptedSource::new().on("TID = 9 ", Response::Null));
    let result = factory(&source).create_time_series_from_ts_ids(
        &[9],
        TimeRange::unbounded(),
        None,
        None,
        None,
    );

    match result {
        Err(Error::NullResponse(query)) => assert!(query.contains("TID = 9")),
        other => panic!("Expected NullResponse, got {:?}", other.map(|s| s.count())),
    }
    assert_eq!(source.sessions(), (1, 1));
}

#[test]
fn test_zero_rows_is_not_null_response() {
    let columns = names(&["TID", "TIMESTAMP", "VALUE"]);
    let source =
        Arc::new(ScriptedSource::new().on("TID = 9 ", Response::Rows(columns, Vec::new())));
    let mut series = factory(&source)
        .create_time_series_from_ts_ids(&[9], TimeRange::unbounded(), None, None, None)
        .unwrap();
    let batch = series
        .fetch_all(FetchType::Tabular)
        .unwrap()
        .unwrap()
        .into_record_batch()
        .unwrap();

    assert_eq!(batch.num_rows(), 0);
    assert_eq!(series.columns(), names(&["TID", "TIMESTAMP", "VALUE"]).as_slice());
}

#[test]
fn test_stacked_ids_keep_shared_value_column() {
    let source = wind_farm();
    let mut series = factory(&source)
        .create_time_series_from_ts_ids(&[1, 2], TimeRange::unbounded(), None, None, None)
        .unwrap();
    let batch = series
        .fetch_all(FetchType::Tabular)
        .unwrap()
        .unwrap()
        .into_record_batch()
        .unwrap();

    assert_eq!(batch.num_rows(), 6);
    assert_eq!(series.columns(), names(&["TID", "TIMESTAMP", "VALUE"]).as_slice());
    assert_eq!(source.queries().len(), 2);
}

#[test]
fn test_stacked_ids_with_shared_label() {
    let source = wind_farm();
    let mut series = factory(&source)
        .create_time_series_from_ts_ids(
            &[1, 3],
            TimeRange::unbounded(),
            None,
            Some(&["power", "power"][..]),
            None,
        )
        .unwrap();
    series.fetch_all(FetchType::Json).unwrap();

    assert_eq!(series.count(), 6);
    assert_eq!(series.columns(), names(&["TID", "TIMESTAMP", "power"]).as_slice());
}

#[test]
fn test_stacked_ids_with_distinct_labels_issue_no_query() {
    let source = wind_farm();
    let result = factory(&source).create_time_series_from_ts_ids(
        &[1, 2],
        TimeRange::unbounded(),
        None,
        Some(&["active power", "rotor speed"][..]),
        None,
    );

    assert!(matches!(result, Err(Error::InvalidArgument(_))));
    assert!(source.queries().is_empty());
    assert_eq!(source.sessions(), (0, 0));
}

#[test]
fn test_backend_failure_propagates_and_releases() {
    let source = Arc::new(
        ScriptedSource::new()
            .series(1, 0, &[1.0])
            .on("TID = 2 ", Response::Fail("table DataPoint is offline".to_string())),
    );
    let result = factory(&source).create_time_series_from_ts_ids(
        &[1, 2, 3],
        TimeRange::unbounded(),
        Some(DEFAULT_MERGE_KEY),
        None,
        None,
    );

    assert!(matches!(result, Err(Error::BackendExecution(_))));
    // the third id is never queried
    assert_eq!(source.queries().len(), 2);
    assert_eq!(source.sessions(), (2, 2));
}

#[test]
fn test_time_range_and_limit_reach_query() {
    let source = wind_farm();
    let range = TimeRange::new(Some(ts(0, 0, 1)), Some(ts(0, 0, 2)));
    factory(&source)
        .create_time_series_from_ts_ids(&[1], range, None, None, Some(2))
        .unwrap();

    assert_eq!(
        source.queries(),
        vec![
            "SELECT * FROM DataPoint WHERE TID = 1 \
             AND TIMESTAMP >= '2019-01-01 00:00:01.000' \
             AND TIMESTAMP <= '2019-01-01 00:00:02.000' LIMIT 2"
                .to_string()
        ]
    );
}

#[test]
fn test_create_time_series_from_model_table() {
    let rows = vec![
        vec![Value::Timestamp(ts(0, 0, 0)), Value::from("WT-01"), Value::Float64(1.5)],
        vec![Value::Timestamp(ts(0, 0, 1)), Value::from("WT-01"), Value::Float64(1.7)],
    ];
    let source = Arc::new(ScriptedSource::new().on(
        "FROM wind_turbine",
        Response::Rows(names(&["datetime", "turbine", "active_power"]), rows),
    ));
    let mut series = factory(&source)
        .create_time_series("wind_turbine", TimeRange::unbounded(), Some(100))
        .unwrap();

    // columns are known before anything is fetched
    assert_eq!(series.columns(), names(&["datetime", "turbine", "active_power"]).as_slice());
    assert_eq!(series.num_cursors(), 1);
    assert_eq!(source.queries(), vec!["SELECT * FROM wind_turbine LIMIT 100".to_string()]);

    let rendered = series.fetch_all(FetchType::Distributed).unwrap().unwrap();
    assert_eq!(rendered.as_partitioned().unwrap().num_rows(), 2);
}

#[test]
fn test_create_time_series_rejects_blank_table() {
    let source = wind_farm();
    assert!(matches!(
        factory(&source).create_time_series("  ", TimeRange::unbounded(), None),
        Err(Error::InvalidArgument(_))
    ));
    assert!(source.queries().is_empty());
}

#[test]
fn test_data_models_query_segments() {
    let segment = |tid: i64, start: u32| {
        vec![
            Value::Int64(tid),
            Value::Timestamp(ts(0, 0, start)),
            Value::Timestamp(ts(0, 0, start + 9)),
            Value::Int64(1),
        ]
    };
    let columns = names(&["TID", "START_TIME", "END_TIME", "MTID"]);
    let source = Arc::new(
        ScriptedSource::new()
            .on("TID = 1 ", Response::Rows(columns.clone(), vec![segment(1, 0), segment(1, 10)]))
            .on("TID = 2 ", Response::Rows(columns, vec![segment(2, 0)])),
    );
    let range = TimeRange::new(Some(ts(0, 0, 0)), None);
    let mut series = factory(&source)
        .create_time_series_data_models_from_ts_ids(&[1, 2], range, None)
        .unwrap();
    series.fetch_all(FetchType::Tabular).unwrap();

    assert_eq!(series.merge_on(), None);
    assert_eq!(series.count(), 3);
    assert_eq!(
        series.columns(),
        names(&["TID", "START_TIME", "END_TIME", "MTID"]).as_slice()
    );
    assert_eq!(
        source.queries()[0],
        "SELECT * FROM Segment WHERE TID = 1 AND START_TIME >= '2019-01-01 00:00:00.000' LIMIT NULL"
    );
}

#[test]
fn test_missing_source() {
    let factory = TimeseriesFactory::new(FactoryConfig::default());
    assert!(matches!(
        factory.create_time_series("wind_turbine", TimeRange::unbounded(), None),
        Err(Error::InvalidArgument(_))
    ));
}
