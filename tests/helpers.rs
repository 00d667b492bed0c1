//! Shared fixtures for the integration tests.
//!
//! `MockSource` is a scripted `MarketDataSource` that records every call.
//! `HttpStub` is a throwaway HTTP server for exercising the real gateway.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use surge_tracker::config::{CollectionConfig, ProviderConfig};
use surge_tracker::market_data::{
    DividendRecord, MarketDataSource, Page, ProviderError, RawBar, SplitRecord, TickerDetails,
    TickerListing,
};
use surge_tracker::store::MemoryStore;
use surge_tracker::{AppConfig, AppState};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

// ============================================================================
// Fixtures
// ============================================================================

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn bar(symbol: &str, close: f64) -> RawBar {
    RawBar {
        symbol: Some(symbol.to_string()),
        open: Some(close),
        high: Some(close),
        low: Some(close),
        close: Some(close),
        volume: Some(1_000.0),
        ..Default::default()
    }
}

pub fn listing(symbol: &str) -> TickerListing {
    TickerListing {
        ticker: symbol.to_string(),
        name: Some(format!("{} Inc.", symbol)),
        market: Some("stocks".to_string()),
        primary_exchange: Some("XNAS".to_string()),
        ticker_type: Some("CS".to_string()),
        currency_name: Some("usd".to_string()),
        active: Some(true),
    }
}

pub fn details(symbol: &str) -> TickerDetails {
    TickerDetails {
        ticker: symbol.to_string(),
        name: Some(format!("{} Holdings", symbol)),
        market_cap: Some(1.5e9),
        share_class_shares_outstanding: Some(10_000_000.0),
        total_employees: Some(250.0),
        list_date: Some("2010-06-29".to_string()),
        sic_code: Some("3711".to_string()),
        ..Default::default()
    }
}

pub fn dividend(symbol: &str, ex_date: &str, amount: f64) -> DividendRecord {
    DividendRecord {
        ticker: Some(symbol.to_string()),
        cash_amount: Some(amount),
        currency: Some("USD".to_string()),
        ex_dividend_date: Some(ex_date.to_string()),
        frequency: Some(4),
        dividend_type: Some("CD".to_string()),
        ..Default::default()
    }
}

pub fn split(symbol: &str, execution_date: &str, from: f64, to: f64) -> SplitRecord {
    SplitRecord {
        ticker: Some(symbol.to_string()),
        execution_date: Some(execution_date.to_string()),
        split_from: Some(from),
        split_to: Some(to),
    }
}

pub fn page<T>(results: Vec<T>, next_cursor: Option<&str>) -> Page<T> {
    Page {
        results,
        next_cursor: next_cursor.map(str::to_string),
    }
}

/// Collection tuning with small batches so commit boundaries show up in tests
pub fn test_collection_config() -> CollectionConfig {
    CollectionConfig {
        surge_threshold_pct: 20.0,
        bulk_commit_days: 2,
        enrichment_commit_size: 2,
        enrichment_max_symbols: None,
        ticker_sync_max_pages: 10,
        corporate_actions_max_pages: 10,
        job_stale_after_minutes: 360,
    }
}

pub fn test_config() -> AppConfig {
    AppConfig {
        collection: test_collection_config(),
        ..Default::default()
    }
}

/// Wire an `AppState` around a scripted source and a fresh in-memory store
pub fn test_app(source: MockSource, config: &AppConfig) -> (AppState, Arc<MockSource>, Arc<MemoryStore>) {
    let source = Arc::new(source);
    let store = Arc::new(MemoryStore::new());
    let state = AppState::new(config, source.clone(), store.clone());
    (state, source, store)
}

// ============================================================================
// Scripted market data source
// ============================================================================

enum DetailsReply {
    Found(TickerDetails),
    Missing,
    Failing,
}

/// `MarketDataSource` answering from in-memory scripts.
///
/// Dates with no script return an empty grouped-daily response, like a
/// weekend or holiday would. Listing pages are keyed by the cursor that
/// requests them; the first page uses the empty key.
#[derive(Default)]
pub struct MockSource {
    grouped: HashMap<NaiveDate, Vec<RawBar>>,
    failing_dates: HashSet<NaiveDate>,
    closes: HashMap<(String, NaiveDate), f64>,
    details: HashMap<String, DetailsReply>,
    ticker_pages: HashMap<String, Page<TickerListing>>,
    dividend_pages: HashMap<String, Page<DividendRecord>>,
    split_pages: HashMap<String, Page<SplitRecord>>,
    calls: Mutex<Calls>,
}

#[derive(Default)]
struct Calls {
    grouped: Vec<NaiveDate>,
    aggregates: Vec<(String, NaiveDate)>,
    details: Vec<String>,
    ticker_cursors: Vec<Option<String>>,
    dividend_cursors: Vec<Option<String>>,
    split_cursors: Vec<Option<String>>,
}

fn cursor_key(cursor: Option<&str>) -> String {
    cursor.unwrap_or_default().to_string()
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_day(mut self, day: NaiveDate, bars: Vec<RawBar>) -> Self {
        self.grouped.insert(day, bars);
        self
    }

    /// Grouped-daily for `day` answers HTTP 500
    pub fn with_failing_day(mut self, day: NaiveDate) -> Self {
        self.failing_dates.insert(day);
        self
    }

    /// Single-symbol aggregate close used by post-surge tracking
    pub fn with_close(mut self, symbol: &str, day: NaiveDate, close: f64) -> Self {
        self.closes.insert((symbol.to_string(), day), close);
        self
    }

    pub fn with_details(mut self, details: TickerDetails) -> Self {
        self.details
            .insert(details.ticker.clone(), DetailsReply::Found(details));
        self
    }

    pub fn with_missing_details(mut self, symbol: &str) -> Self {
        self.details.insert(symbol.to_string(), DetailsReply::Missing);
        self
    }

    pub fn with_failing_details(mut self, symbol: &str) -> Self {
        self.details.insert(symbol.to_string(), DetailsReply::Failing);
        self
    }

    pub fn with_ticker_page(mut self, cursor: Option<&str>, page: Page<TickerListing>) -> Self {
        self.ticker_pages.insert(cursor_key(cursor), page);
        self
    }

    pub fn with_dividend_page(mut self, cursor: Option<&str>, page: Page<DividendRecord>) -> Self {
        self.dividend_pages.insert(cursor_key(cursor), page);
        self
    }

    pub fn with_split_page(mut self, cursor: Option<&str>, page: Page<SplitRecord>) -> Self {
        self.split_pages.insert(cursor_key(cursor), page);
        self
    }

    pub fn grouped_calls(&self) -> Vec<NaiveDate> {
        self.calls.lock().unwrap().grouped.clone()
    }

    pub fn aggregate_calls(&self) -> Vec<(String, NaiveDate)> {
        self.calls.lock().unwrap().aggregates.clone()
    }

    pub fn details_calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().details.clone()
    }

    pub fn ticker_cursors(&self) -> Vec<Option<String>> {
        self.calls.lock().unwrap().ticker_cursors.clone()
    }

    pub fn dividend_cursors(&self) -> Vec<Option<String>> {
        self.calls.lock().unwrap().dividend_cursors.clone()
    }

    pub fn split_cursors(&self) -> Vec<Option<String>> {
        self.calls.lock().unwrap().split_cursors.clone()
    }
}

fn server_error(endpoint: String) -> ProviderError {
    ProviderError::Status {
        status: 500,
        endpoint,
    }
}

fn scripted_page<T: Clone>(pages: &HashMap<String, Page<T>>, cursor: Option<&str>) -> Page<T> {
    pages
        .get(&cursor_key(cursor))
        .cloned()
        .unwrap_or_else(|| Page::last(Vec::new()))
}

#[async_trait]
impl MarketDataSource for MockSource {
    async fn grouped_daily(&self, date: NaiveDate) -> Result<Vec<RawBar>, ProviderError> {
        self.calls.lock().unwrap().grouped.push(date);
        if self.failing_dates.contains(&date) {
            return Err(server_error(format!("grouped_daily/{}", date)));
        }
        Ok(self.grouped.get(&date).cloned().unwrap_or_default())
    }

    async fn ticker_details(&self, symbol: &str) -> Result<Option<TickerDetails>, ProviderError> {
        self.calls.lock().unwrap().details.push(symbol.to_string());
        match self.details.get(symbol) {
            Some(DetailsReply::Found(details)) => Ok(Some(details.clone())),
            Some(DetailsReply::Failing) => Err(server_error(format!("ticker_details/{}", symbol))),
            Some(DetailsReply::Missing) | None => Ok(None),
        }
    }

    async fn tickers_list(&self, cursor: Option<&str>) -> Result<Page<TickerListing>, ProviderError> {
        self.calls
            .lock()
            .unwrap()
            .ticker_cursors
            .push(cursor.map(str::to_string));
        Ok(scripted_page(&self.ticker_pages, cursor))
    }

    async fn aggregate_bars(
        &self,
        symbol: &str,
        from: NaiveDate,
        _to: NaiveDate,
    ) -> Result<Vec<RawBar>, ProviderError> {
        self.calls
            .lock()
            .unwrap()
            .aggregates
            .push((symbol.to_string(), from));
        Ok(self
            .closes
            .get(&(symbol.to_string(), from))
            .map(|close| {
                // Aggregate bars carry no symbol field
                let mut bar = bar(symbol, *close);
                bar.symbol = None;
                vec![bar]
            })
            .unwrap_or_default())
    }

    async fn dividends(&self, cursor: Option<&str>) -> Result<Page<DividendRecord>, ProviderError> {
        self.calls
            .lock()
            .unwrap()
            .dividend_cursors
            .push(cursor.map(str::to_string));
        Ok(scripted_page(&self.dividend_pages, cursor))
    }

    async fn splits(&self, cursor: Option<&str>) -> Result<Page<SplitRecord>, ProviderError> {
        self.calls
            .lock()
            .unwrap()
            .split_cursors
            .push(cursor.map(str::to_string));
        Ok(scripted_page(&self.split_pages, cursor))
    }
}

// ============================================================================
// HTTP stub
// ============================================================================

/// Minimal HTTP/1.1 server answering each connection with the next scripted
/// response. Records the request line of every request it served.
pub struct HttpStub {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<String>>>,
}

impl HttpStub {
    /// Bind to an ephemeral port and serve `responses` (status, JSON body) in order.
    /// Once the script is exhausted every request gets a 500.
    pub async fn start(responses: Vec<(u16, String)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let script = Arc::new(Mutex::new(VecDeque::from(responses)));

        let seen = Arc::clone(&requests);
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };

                let mut buf = Vec::new();
                let mut chunk = [0u8; 1024];
                while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut chunk).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => buf.extend_from_slice(&chunk[..n]),
                    }
                }
                let request = String::from_utf8_lossy(&buf);
                let request_line = request.lines().next().unwrap_or_default().to_string();
                seen.lock().unwrap().push(request_line);

                let (status, body) = script
                    .lock()
                    .unwrap()
                    .pop_front()
                    .unwrap_or((500, "{}".to_string()));
                let response = format!(
                    "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    reason(status),
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        Self { addr, requests }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    /// Provider settings pointing at this stub, with no retry cooldown
    pub fn provider_config(&self, max_retries: u32) -> ProviderConfig {
        ProviderConfig {
            api_key: "test-key".to_string(),
            base_url: self.base_url(),
            max_tokens: 100,
            requests_per_minute: 6_000,
            timeout_secs: 5,
            max_retries,
            retry_backoff_secs: 0,
        }
    }
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        404 => "Not Found",
        429 => "Too Many Requests",
        _ => "Internal Server Error",
    }
}
