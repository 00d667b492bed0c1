mod helpers;

use chrono::{Duration, Utc};
use helpers::*;
use surge_tracker::models::{CollectionLog, JobStatus, JobType, SURGE_THRESHOLD_KEY};
use surge_tracker::store::MarketStore;
use surge_tracker::AppError;
use tokio_test::{assert_err, assert_ok};

// ============================================================================
// Daily collection
// ============================================================================

#[tokio::test]
async fn test_daily_collection_is_idempotent() {
    let monday = date(2024, 3, 11);
    let tuesday = date(2024, 3, 12);
    let source = MockSource::new()
        .with_day(monday, vec![bar("AAA", 100.0), bar("BBB", 50.0)])
        .with_day(tuesday, vec![bar("AAA", 130.0), bar("BBB", 51.0)]);
    let (app, _source, store) = test_app(source, &test_config());

    let first = app.collection.run_daily_collection(Some(tuesday)).await.unwrap();
    assert_eq!(first.records_count, 1);

    let second = app.collection.run_daily_collection(Some(tuesday)).await.unwrap();
    assert_eq!(second.records_count, 0);

    let events = store.surge_events().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].symbol, "AAA");
    assert_eq!(events[0].event_date, tuesday);
    assert_eq!(events[0].prev_close, 100.0);
    assert_eq!(events[0].change_pct, 30.0);

    // Surging symbols get a stub directory row
    let ticker = store.ticker("AAA").await.unwrap();
    assert!(ticker.needs_details());
    assert!(store.ticker("BBB").await.is_none());

    let logs = store.logs().await;
    assert_eq!(logs.len(), 2);
    assert!(logs.iter().all(|l| l.status_enum() == JobStatus::Completed));
}

#[tokio::test]
async fn test_threshold_is_inclusive() {
    let monday = date(2024, 3, 11);
    let tuesday = date(2024, 3, 12);
    let script = || {
        MockSource::new()
            .with_day(monday, vec![bar("EDGE", 100.0)])
            .with_day(tuesday, vec![bar("EDGE", 120.0)])
    };

    let (app, _source, store) = test_app(script(), &test_config());
    let outcome = app.collection.run_daily_collection(Some(tuesday)).await.unwrap();
    assert_eq!(outcome.records_count, 1);
    assert_eq!(store.surge_events().await[0].change_pct, 20.0);

    let mut config = test_config();
    config.collection.surge_threshold_pct = 20.01;
    let (app, _source, store) = test_app(script(), &config);
    let outcome = app.collection.run_daily_collection(Some(tuesday)).await.unwrap();
    assert_eq!(outcome.records_count, 0);
    assert!(store.surge_events().await.is_empty());
}

#[tokio::test]
async fn test_stored_threshold_overrides_default() {
    let monday = date(2024, 3, 11);
    let tuesday = date(2024, 3, 12);
    let source = MockSource::new()
        .with_day(monday, vec![bar("AAA", 100.0), bar("BBB", 100.0)])
        .with_day(tuesday, vec![bar("AAA", 112.0), bar("BBB", 105.0)]);
    let (app, _source, store) = test_app(source, &test_config());

    app.settings.update(SURGE_THRESHOLD_KEY, "10").await.unwrap();
    let outcome = app.collection.run_daily_collection(Some(tuesday)).await.unwrap();

    assert_eq!(outcome.records_count, 1);
    assert_eq!(store.surge_events().await[0].symbol, "AAA");
}

#[tokio::test]
async fn test_monday_compares_against_friday() {
    let friday = date(2024, 3, 15);
    let monday = date(2024, 3, 18);
    let source = MockSource::new()
        .with_day(friday, vec![bar("FRI", 10.0)])
        .with_day(monday, vec![bar("FRI", 15.0)]);
    let (app, source, store) = test_app(source, &test_config());

    let outcome = app.collection.run_daily_collection(Some(monday)).await.unwrap();

    assert_eq!(outcome.records_count, 1);
    assert_eq!(source.grouped_calls(), vec![monday, friday]);
    assert_eq!(store.surge_events().await[0].prev_close, 10.0);
}

#[tokio::test]
async fn test_holiday_is_skipped_when_resolving_previous_day() {
    // Good Friday 2024 has no bars
    let thursday = date(2024, 3, 28);
    let good_friday = date(2024, 3, 29);
    let monday = date(2024, 4, 1);
    let source = MockSource::new()
        .with_day(thursday, vec![bar("HOL", 4.0)])
        .with_day(monday, vec![bar("HOL", 5.0)]);
    let (app, source, store) = test_app(source, &test_config());

    let outcome = app.collection.run_daily_collection(Some(monday)).await.unwrap();

    assert_eq!(outcome.records_count, 1);
    assert_eq!(source.grouped_calls(), vec![monday, good_friday, thursday]);
    assert_eq!(store.surge_events().await[0].change_pct, 25.0);
}

#[tokio::test]
async fn test_no_previous_day_within_lookback_creates_nothing() {
    let monday = date(2024, 3, 18);
    let source = MockSource::new().with_day(monday, vec![bar("AAA", 15.0)]);
    let (app, source, store) = test_app(source, &test_config());

    let outcome = app.collection.run_daily_collection(Some(monday)).await.unwrap();

    assert_eq!(outcome.records_count, 0);
    assert!(store.surge_events().await.is_empty());
    // Target plus seven weekday lookups
    let calls = source.grouped_calls();
    assert_eq!(calls.len(), 8);
    assert!(calls.iter().all(|d| !surge_tracker::calendar::is_weekend(*d)));
}

#[tokio::test]
async fn test_empty_day_completes_with_zero() {
    let saturday = date(2024, 3, 16);
    let (app, source, store) = test_app(MockSource::new(), &test_config());

    let outcome = app.collection.run_daily_collection(Some(saturday)).await.unwrap();

    assert_eq!(outcome.records_count, 0);
    assert_eq!(source.grouped_calls(), vec![saturday]);
    assert!(source.aggregate_calls().is_empty());
    let log = store.get_job(outcome.log_id).await.unwrap().unwrap();
    assert_eq!(log.status_enum(), JobStatus::Completed);
}

#[tokio::test]
async fn test_provider_failure_fails_the_ledger_row() {
    let tuesday = date(2024, 3, 12);
    let source = MockSource::new().with_failing_day(tuesday);
    let (app, _source, store) = test_app(source, &test_config());

    let err = app
        .collection
        .run_daily_collection(Some(tuesday))
        .await
        .unwrap_err();

    let log_id = err.job_log_id().unwrap();
    let log = store.get_job(log_id).await.unwrap().unwrap();
    assert_eq!(log.status_enum(), JobStatus::Failed);
    assert_eq!(log.records_count, 0);
    assert!(log.error_message.unwrap().contains("HTTP 500"));
}

// ============================================================================
// Post-surge tracking
// ============================================================================

#[tokio::test]
async fn test_tracking_runs_once_per_offset() {
    let monday = date(2024, 3, 11);
    let tuesday = date(2024, 3, 12);
    let source = MockSource::new()
        .with_day(monday, vec![bar("SRG", 10.0), bar("ZZZ", 5.0)])
        .with_day(tuesday, vec![bar("ZZZ", 5.0)])
        .with_close("SRG", tuesday, 12.0);
    let (app, source, store) = test_app(source, &test_config());

    // A surge recorded on Monday, one day before the run date
    store.ensure_ticker("SRG").await.unwrap();
    let event = store
        .insert_surge_event(&surge_tracker::models::NewSurgeEvent {
            symbol: "SRG".into(),
            event_date: monday,
            open: 8.0,
            high: 10.5,
            low: 8.0,
            close: 10.0,
            volume: 5_000,
            prev_close: 8.0,
            change_pct: 25.0,
            vwap: None,
        })
        .await
        .unwrap()
        .unwrap();

    app.collection.run_daily_collection(Some(tuesday)).await.unwrap();
    app.collection.run_daily_collection(Some(tuesday)).await.unwrap();

    let tracking = store.tracking().await;
    assert_eq!(tracking.len(), 1);
    assert_eq!(tracking[0].surge_event_id, event.id);
    assert_eq!(tracking[0].days_after, 1);
    assert_eq!(tracking[0].close_price, 12.0);
    assert_eq!(tracking[0].change_from_surge_pct, 20.0);
    assert_eq!(tracking[0].tracked_date, tuesday);

    // Second run finds the snapshot and never asks the provider again
    assert_eq!(source.aggregate_calls(), vec![("SRG".to_string(), tuesday)]);
}

#[tokio::test]
async fn test_tracking_waits_when_no_bar_exists() {
    let monday = date(2024, 3, 11);
    let tuesday = date(2024, 3, 12);
    let source = MockSource::new()
        .with_day(monday, vec![bar("ZZZ", 5.0)])
        .with_day(tuesday, vec![bar("ZZZ", 5.0)]);
    let (app, source, store) = test_app(source, &test_config());

    store.ensure_ticker("HALT").await.unwrap();
    store
        .insert_surge_event(&surge_tracker::models::NewSurgeEvent {
            symbol: "HALT".into(),
            event_date: monday,
            open: 1.0,
            high: 1.4,
            low: 1.0,
            close: 1.3,
            volume: 100,
            prev_close: 1.0,
            change_pct: 30.0,
            vwap: None,
        })
        .await
        .unwrap();

    app.collection.run_daily_collection(Some(tuesday)).await.unwrap();

    assert!(store.tracking().await.is_empty());
    assert_eq!(source.aggregate_calls().len(), 1);
}

// ============================================================================
// Backfill
// ============================================================================

#[tokio::test]
async fn test_backfill_sums_surges_over_weekdays() {
    let source = MockSource::new()
        .with_day(date(2024, 3, 8), vec![bar("RUN", 100.0)])
        .with_day(date(2024, 3, 11), vec![bar("RUN", 125.0)])
        .with_day(date(2024, 3, 12), vec![bar("RUN", 130.0)])
        .with_day(date(2024, 3, 13), vec![bar("RUN", 162.5)]);
    let (app, source, store) = test_app(source, &test_config());

    let outcome = app
        .collection
        .run_backfill(date(2024, 3, 9), date(2024, 3, 13))
        .await
        .unwrap();

    // +25% on the 11th, +4% on the 12th, +25% on the 13th
    assert_eq!(outcome.records_count, 2);
    assert_eq!(store.surge_events().await.len(), 2);
    assert!(!source.grouped_calls().contains(&date(2024, 3, 9)));
    assert!(!source.grouped_calls().contains(&date(2024, 3, 10)));
}

#[tokio::test]
async fn test_backfill_rejects_inverted_range() {
    let (app, source, store) = test_app(MockSource::new(), &test_config());

    let err = assert_err!(
        app.collection
            .run_backfill(date(2024, 3, 15), date(2024, 3, 11))
            .await
    );

    assert!(matches!(err, AppError::Validation(_)));
    assert!(source.grouped_calls().is_empty());
    assert!(store.logs().await.is_empty());
}

// ============================================================================
// Bulk download
// ============================================================================

#[tokio::test]
async fn test_bulk_download_skips_stored_dates_and_commits_in_batches() {
    let source = MockSource::new()
        .with_day(date(2024, 3, 11), vec![bar("AAA", 1.0), bar("BBB", 2.0)])
        .with_day(date(2024, 3, 12), vec![bar("AAA", 1.1)])
        .with_day(date(2024, 3, 13), vec![bar("AAA", 1.2), bar("BBB", 2.2)])
        .with_day(date(2024, 3, 15), vec![bar("AAA", 1.3)]);
    let (app, source, store) = test_app(source, &test_config());

    // The 12th is already on disk from an earlier run
    store
        .insert_daily_prices(&[surge_tracker::models::NewDailyPrice {
            symbol: "AAA".into(),
            trade_date: date(2024, 3, 12),
            open: 1.1,
            high: 1.1,
            low: 1.1,
            close: 1.1,
            volume: 10,
            vwap: None,
            transactions: None,
        }])
        .await
        .unwrap();

    let outcome = app
        .collection
        .run_bulk_download(date(2024, 3, 11), date(2024, 3, 17))
        .await
        .unwrap();

    assert_eq!(outcome.records_count, 5);
    // The 14th is a holiday in this script; the weekend is never requested
    assert_eq!(
        source.grouped_calls(),
        vec![
            date(2024, 3, 11),
            date(2024, 3, 13),
            date(2024, 3, 14),
            date(2024, 3, 15)
        ]
    );
    // One seed batch, one after two downloaded days, one final flush
    assert_eq!(store.price_batches().await, 3);
    assert_eq!(store.prices().await.len(), 6);

    let rerun = app
        .collection
        .run_bulk_download(date(2024, 3, 11), date(2024, 3, 17))
        .await
        .unwrap();
    assert_eq!(rerun.records_count, 0);
    assert_eq!(source.grouped_calls().len(), 5);
    assert_eq!(source.grouped_calls()[4], date(2024, 3, 14));
}

// ============================================================================
// Ticker directory
// ============================================================================

#[tokio::test]
async fn test_ticker_sync_follows_cursor_to_last_page() {
    let source = MockSource::new()
        .with_ticker_page(None, page(vec![listing("AAA"), listing("BBB")], Some("p2")))
        .with_ticker_page(Some("p2"), page(vec![listing("CCC")], Some("p3")))
        .with_ticker_page(Some("p3"), page(vec![listing("DDD")], None));
    let (app, source, store) = test_app(source, &test_config());

    let outcome = app.collection.run_ticker_sync().await.unwrap();

    assert_eq!(outcome.records_count, 4);
    assert_eq!(
        source.ticker_cursors(),
        vec![None, Some("p2".to_string()), Some("p3".to_string())]
    );
    assert_eq!(store.count_tickers().await.unwrap(), 4);
    let ticker = store.ticker("CCC").await.unwrap();
    assert_eq!(ticker.exchange.as_deref(), Some("XNAS"));
    assert!(ticker.active);
}

#[tokio::test]
async fn test_ticker_sync_respects_page_limit() {
    let source = MockSource::new()
        .with_ticker_page(None, page(vec![listing("AAA")], Some("p2")))
        .with_ticker_page(Some("p2"), page(vec![listing("BBB")], Some("p3")))
        .with_ticker_page(Some("p3"), page(vec![listing("CCC")], None));
    let mut config = test_config();
    config.collection.ticker_sync_max_pages = 2;
    let (app, source, _store) = test_app(source, &config);

    let outcome = app.collection.run_ticker_sync().await.unwrap();

    assert_eq!(outcome.records_count, 2);
    assert_eq!(source.ticker_cursors().len(), 2);
}

#[tokio::test]
async fn test_ticker_sync_stops_on_empty_page_with_cursor() {
    let source = MockSource::new()
        .with_ticker_page(None, page(vec![listing("AAA")], Some("p2")))
        .with_ticker_page(Some("p2"), page(Vec::new(), Some("p3")));
    let (app, source, _store) = test_app(source, &test_config());

    let outcome = app.collection.run_ticker_sync().await.unwrap();

    assert_eq!(outcome.records_count, 1);
    assert_eq!(source.ticker_cursors().len(), 2);
}

#[tokio::test]
async fn test_enrichment_skips_failures_and_leaves_them_pending() {
    let source = MockSource::new()
        .with_details(details("AAA"))
        .with_missing_details("BBB")
        .with_failing_details("CCC");
    let (app, source, store) = test_app(source, &test_config());
    for symbol in ["AAA", "BBB", "CCC"] {
        store.ensure_ticker(symbol).await.unwrap();
    }

    let outcome = app.collection.run_ticker_enrichment().await.unwrap();

    assert_eq!(outcome.records_count, 1);
    let enriched = store.ticker("AAA").await.unwrap();
    assert!(!enriched.needs_details());
    assert_eq!(enriched.name.as_deref(), Some("AAA Holdings"));
    assert_eq!(enriched.shares_outstanding, Some(10_000_000));
    assert_eq!(enriched.list_date, Some(date(2010, 6, 29)));
    assert!(store.ticker("BBB").await.unwrap().needs_details());
    assert!(store.ticker("CCC").await.unwrap().needs_details());
    // Commit size 2: one batch after the second symbol, nothing left for the end
    assert_eq!(store.detail_batches().await, 1);

    app.collection.run_ticker_enrichment().await.unwrap();
    assert_eq!(
        source.details_calls(),
        vec!["AAA", "BBB", "CCC", "BBB", "CCC"]
    );
}

#[tokio::test]
async fn test_enrichment_honours_symbol_cap() {
    let source = MockSource::new()
        .with_details(details("AAA"))
        .with_details(details("BBB"))
        .with_details(details("CCC"));
    let mut config = test_config();
    config.collection.enrichment_max_symbols = Some(2);
    let (app, source, store) = test_app(source, &config);
    for symbol in ["AAA", "BBB", "CCC"] {
        store.ensure_ticker(symbol).await.unwrap();
    }

    let outcome = app.collection.run_ticker_enrichment().await.unwrap();

    assert_eq!(outcome.records_count, 2);
    assert_eq!(source.details_calls().len(), 2);
    assert_eq!(store.tickers_missing_details(None).await.unwrap(), vec!["CCC"]);
}

#[tokio::test]
async fn test_unknown_symbol_does_not_block_capped_enrichment() {
    let source = MockSource::new()
        .with_missing_details("AAA")
        .with_details(details("BBB"));
    let mut config = test_config();
    config.collection.enrichment_max_symbols = Some(1);
    let (app, source, store) = test_app(source, &config);
    for symbol in ["AAA", "BBB"] {
        store.ensure_ticker(symbol).await.unwrap();
    }

    assert_ok!(app.collection.run_ticker_enrichment().await);
    assert_eq!(store.tickers_missing_details(None).await.unwrap(), vec!["BBB", "AAA"]);

    let outcome = assert_ok!(app.collection.run_ticker_enrichment().await);
    assert_eq!(outcome.records_count, 1);
    assert!(!store.ticker("BBB").await.unwrap().needs_details());

    // Only the unknown symbol is left, so it is retried
    assert_ok!(app.collection.run_ticker_enrichment().await);
    assert_eq!(source.details_calls(), vec!["AAA", "BBB", "AAA"]);
    assert!(store.ticker("AAA").await.unwrap().needs_details());
}

// ============================================================================
// Corporate actions
// ============================================================================

#[tokio::test]
async fn test_dividends_page_until_cursor_runs_out() {
    let source = MockSource::new()
        .with_dividend_page(
            None,
            page(
                vec![
                    dividend("AAA", "2024-02-09", 0.24),
                    dividend("AAA", "2024-02-09", 0.24),
                    dividend("BBB", "not-a-date", 0.10),
                ],
                Some("d2"),
            ),
        )
        .with_dividend_page(Some("d2"), page(vec![dividend("CCC", "2024-03-01", 1.5)], None));
    let (app, source, store) = test_app(source, &test_config());

    let outcome = app.collection.run_dividend_download().await.unwrap();

    assert_eq!(outcome.records_count, 2);
    assert_eq!(source.dividend_cursors(), vec![None, Some("d2".to_string())]);
    let dividends = store.dividends().await;
    assert_eq!(dividends.len(), 2);
    assert_eq!(dividends[0].ex_dividend_date, date(2024, 2, 9));
}

#[tokio::test]
async fn test_splits_are_unique_per_symbol_and_date() {
    let source = MockSource::new().with_split_page(
        None,
        page(
            vec![
                split("NVDA", "2024-06-10", 1.0, 10.0),
                split("NVDA", "2024-06-10", 1.0, 10.0),
                split("BAD", "2024-06-10", 0.0, 2.0),
                split("AAPL", "2020-08-31", 1.0, 4.0),
            ],
            None,
        ),
    );
    let (app, _source, store) = test_app(source, &test_config());

    let first = app.collection.run_split_download().await.unwrap();
    assert_eq!(first.records_count, 2);

    let second = app.collection.run_split_download().await.unwrap();
    assert_eq!(second.records_count, 0);
    assert_eq!(store.splits().await.len(), 2);
}

#[tokio::test]
async fn test_corporate_action_download_stops_on_empty_first_page() {
    let (app, source, _store) = test_app(MockSource::new(), &test_config());

    let outcome = app.collection.run_split_download().await.unwrap();

    assert_eq!(outcome.records_count, 0);
    assert_eq!(source.split_cursors(), vec![None]);
}

// ============================================================================
// Ledger guard
// ============================================================================

fn running_log(job_type: JobType, started_ago: Duration) -> CollectionLog {
    CollectionLog {
        id: 0,
        job_type: job_type.as_str().to_string(),
        started_at: Utc::now() - started_ago,
        completed_at: None,
        status: JobStatus::Running.as_str().to_string(),
        records_count: 0,
        error_message: None,
    }
}

#[tokio::test]
async fn test_fresh_running_job_blocks_same_type() {
    let (app, source, store) = test_app(MockSource::new(), &test_config());
    let held = store
        .seed_log(running_log(JobType::DailyCollection, Duration::minutes(5)))
        .await;

    let err = app
        .collection
        .run_daily_collection(Some(date(2024, 3, 12)))
        .await
        .unwrap_err();

    match err {
        AppError::JobAlreadyRunning { job_type, log_id } => {
            assert_eq!(job_type, JobType::DailyCollection);
            assert_eq!(log_id, held.id);
        }
        other => panic!("unexpected error: {}", other),
    }
    assert!(source.grouped_calls().is_empty());

    // Other job types are unaffected
    assert_ok!(app.collection.run_split_download().await);
}

#[tokio::test]
async fn test_stale_running_job_is_closed_and_replaced() {
    let (app, _source, store) = test_app(MockSource::new(), &test_config());
    let stale = store
        .seed_log(running_log(JobType::DailyCollection, Duration::hours(7)))
        .await;

    let outcome = app
        .collection
        .run_daily_collection(Some(date(2024, 3, 16)))
        .await
        .unwrap();

    let old = store.get_job(stale.id).await.unwrap().unwrap();
    assert_eq!(old.status_enum(), JobStatus::Failed);
    assert_eq!(
        old.error_message.as_deref(),
        Some("abandoned: still running after 360 minutes")
    );
    assert_ne!(outcome.log_id, stale.id);
}
