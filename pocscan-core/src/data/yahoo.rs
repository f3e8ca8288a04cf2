//! Yahoo Finance bar provider.
//!
//! Talks to the unofficial v8 chart API. Handles rate limiting, retries with
//! exponential backoff, the shared circuit breaker, and optional split/dividend
//! adjustment from the `adjclose` column.
//!
//! The API is unannounced and changes without notice; the CSV provider is the
//! offline fallback.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime};
use serde::Deserialize;
use tracing::{debug, warn};

use super::circuit_breaker::CircuitBreaker;
use super::provider::{
    backoff_delay, BarProvider, DataError, DataSource, FetchRequest, PriceAdjustment, RawBar,
};
use crate::domain::Lookback;

const CHART_ENDPOINT: &str = "https://query2.finance.yahoo.com/v8/finance/chart";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteColumns>,
    adjclose: Option<Vec<AdjCloseColumn>>,
}

#[derive(Debug, Deserialize)]
struct QuoteColumns {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseColumn {
    adjclose: Vec<Option<f64>>,
}

pub struct YahooProvider {
    client: reqwest::blocking::Client,
    circuit_breaker: Arc<CircuitBreaker>,
    max_retries: u32,
    base_delay: Duration,
}

impl YahooProvider {
    pub fn new(circuit_breaker: Arc<CircuitBreaker>) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            circuit_breaker,
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        })
    }

    /// HTTP-level retries per request (on top of the batch-level retries).
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Chart URL for a request. Bounded lookbacks use an explicit
    /// `period1`/`period2` window; `max` uses `range=max`.
    pub fn chart_url(request: &FetchRequest) -> String {
        let symbol = &request.symbol;
        let interval = request.interval.code();
        let window = match (request.lookback, request.start()) {
            (Lookback::Max, _) | (_, None) => "range=max".to_string(),
            (_, Some(start)) => format!(
                "period1={}&period2={}",
                start.and_utc().timestamp(),
                request.as_of.and_utc().timestamp()
            ),
        };
        format!(
            "{CHART_ENDPOINT}/{symbol}?{window}&interval={interval}\
             &includePrePost=false&events=div%2Csplits"
        )
    }

    fn parse_response(
        request: &FetchRequest,
        resp: ChartResponse,
    ) -> Result<Vec<RawBar>, DataError> {
        let symbol = request.symbol.as_str();
        let result = resp.chart.result.ok_or_else(|| match resp.chart.error {
            Some(err) if err.code == "Not Found" => DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            },
            Some(err) => {
                DataError::ResponseFormatChanged(format!("{}: {}", err.code, err.description))
            }
            None => DataError::ResponseFormatChanged("empty result with no error".into()),
        })?;

        let data = result
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged("result array is empty".into()))?;

        // A valid symbol with no trades in the window has no timestamp array.
        let Some(timestamps) = data.timestamp else {
            return Err(DataError::Empty {
                symbol: symbol.to_string(),
            });
        };

        let quote = data
            .indicators
            .quote
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged("no quote data".into()))?;

        let adj_closes = match request.adjustment {
            PriceAdjustment::Raw => None,
            PriceAdjustment::Adjusted => data
                .indicators
                .adjclose
                .and_then(|v| v.into_iter().next())
                .map(|a| a.adjclose),
        };

        let intraday = request.interval.is_intraday();
        let mut bars = Vec::with_capacity(timestamps.len());

        for (i, &ts) in timestamps.iter().enumerate() {
            let timestamp = bar_timestamp(ts, intraday).ok_or_else(|| {
                DataError::ResponseFormatChanged(format!("invalid timestamp: {ts}"))
            })?;

            let at = |col: &Vec<Option<f64>>| col.get(i).copied().flatten();
            let open = at(&quote.open);
            let high = at(&quote.high);
            let low = at(&quote.low);
            let close = at(&quote.close);
            let volume = at(&quote.volume);

            // Holidays and halted sessions come back as all-null rows.
            if open.is_none() && high.is_none() && low.is_none() && close.is_none() {
                continue;
            }

            let mut bar = RawBar {
                timestamp,
                open,
                high: high.unwrap_or(f64::NAN),
                low: low.unwrap_or(f64::NAN),
                close: close.unwrap_or(f64::NAN),
                volume: volume.unwrap_or(0.0),
            };

            if let Some(adj) = adj_closes.as_ref().and_then(|v| at(v)) {
                apply_adjustment(&mut bar, adj);
            }

            bars.push(bar);
        }

        if bars.is_empty() {
            return Err(DataError::Empty {
                symbol: symbol.to_string(),
            });
        }

        Ok(bars)
    }

    fn fetch_with_retry(&self, request: &FetchRequest) -> Result<Vec<RawBar>, DataError> {
        let url = Self::chart_url(request);
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = backoff_delay(self.base_delay, attempt);
                debug!(request = %request, attempt, ?delay, "retrying Yahoo request");
                std::thread::sleep(delay);
            }

            if !self.circuit_breaker.is_allowed() {
                return Err(DataError::CircuitBreakerTripped);
            }

            let resp = match self.client.get(&url).send() {
                Ok(resp) => resp,
                Err(e) if e.is_connect() || e.is_timeout() => {
                    last_error = Some(DataError::NetworkUnreachable(e.to_string()));
                    continue;
                }
                Err(e) => return Err(DataError::NetworkUnreachable(e.to_string())),
            };

            let status = resp.status();

            if status == reqwest::StatusCode::FORBIDDEN {
                warn!(request = %request, "Yahoo returned 403, tripping circuit breaker");
                self.circuit_breaker.trip();
                return Err(DataError::CircuitBreakerTripped);
            }

            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                self.circuit_breaker.record_failure();
                let retry_after_secs = resp
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(60);
                last_error = Some(DataError::RateLimited { retry_after_secs });
                continue;
            }

            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(DataError::SymbolNotFound {
                    symbol: request.symbol.clone(),
                });
            }

            if !status.is_success() {
                self.circuit_breaker.record_failure();
                last_error = Some(DataError::Other(format!(
                    "HTTP {status} for {}",
                    request.symbol
                )));
                continue;
            }

            let chart: ChartResponse = resp.json().map_err(|e| {
                DataError::ResponseFormatChanged(format!(
                    "failed to parse response for {}: {e}",
                    request.symbol
                ))
            })?;

            self.circuit_breaker.record_success();
            return Self::parse_response(request, chart);
        }

        Err(last_error.unwrap_or_else(|| DataError::Other("max retries exceeded".into())))
    }
}

/// Daily and coarser bars are keyed by calendar date (midnight); intraday bars
/// keep their UTC time.
fn bar_timestamp(epoch_secs: i64, intraday: bool) -> Option<NaiveDateTime> {
    let dt = DateTime::from_timestamp(epoch_secs, 0)?.naive_utc();
    if intraday {
        Some(dt)
    } else {
        dt.date().and_hms_opt(0, 0, 0)
    }
}

/// Scale OHLC by adjclose/close so the whole bar is on the adjusted basis.
fn apply_adjustment(bar: &mut RawBar, adj_close: f64) {
    if !bar.close.is_finite() || bar.close == 0.0 || !adj_close.is_finite() {
        return;
    }
    let ratio = adj_close / bar.close;
    bar.open = bar.open.map(|o| o * ratio);
    bar.high *= ratio;
    bar.low *= ratio;
    bar.close = adj_close;
}

impl BarProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn source(&self) -> DataSource {
        DataSource::YahooFinance
    }

    fn fetch(&self, request: &FetchRequest) -> Result<Vec<RawBar>, DataError> {
        let bars = self.fetch_with_retry(request)?;
        debug!(request = %request, bars = bars.len(), "fetched from Yahoo");
        Ok(bars)
    }

    fn is_available(&self) -> bool {
        self.circuit_breaker.is_allowed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Interval;
    use chrono::NaiveDate;

    fn as_of() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 28)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn parse(request: &FetchRequest, json: &str) -> Result<Vec<RawBar>, DataError> {
        let resp: ChartResponse = serde_json::from_str(json).unwrap();
        YahooProvider::parse_response(request, resp)
    }

    const SAMPLE: &str = r#"{
        "chart": {
            "result": [{
                "timestamp": [1719495000, 1719581400, 1719840600],
                "indicators": {
                    "quote": [{
                        "open":   [10.0, null, 12.0],
                        "high":   [11.0, null, 13.0],
                        "low":    [9.0,  null, 11.0],
                        "close":  [10.5, null, 12.0],
                        "volume": [1000, null, 3000]
                    }],
                    "adjclose": [{ "adjclose": [5.25, null, 6.0] }]
                }
            }],
            "error": null
        }
    }"#;

    #[test]
    fn url_for_bounded_lookback() {
        let req = FetchRequest::new("SPY", Lookback::Days(5), Interval::Day1, as_of());
        let url = YahooProvider::chart_url(&req);
        assert!(url.starts_with("https://query2.finance.yahoo.com/v8/finance/chart/SPY?period1="));
        assert!(url.contains(&format!("period2={}", as_of().and_utc().timestamp())));
        assert!(url.contains("interval=1d"));
    }

    #[test]
    fn url_for_max_lookback() {
        let req = FetchRequest::new("^GSPC", Lookback::Max, Interval::Week1, as_of());
        let url = YahooProvider::chart_url(&req);
        assert!(url.contains("range=max"));
        assert!(url.contains("interval=1wk"));
        assert!(!url.contains("period1"));
    }

    #[test]
    fn parses_and_skips_null_rows() {
        let req = FetchRequest::new("X", Lookback::Days(5), Interval::Day1, as_of());
        let bars = parse(&req, SAMPLE).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].close, 10.5);
        assert_eq!(bars[0].volume, 1000.0);
        assert_eq!(bars[0].timestamp.time(), chrono::NaiveTime::MIN);
    }

    #[test]
    fn adjusted_request_scales_ohlc() {
        let req = FetchRequest::new("X", Lookback::Days(5), Interval::Day1, as_of()).adjusted();
        let bars = parse(&req, SAMPLE).unwrap();
        assert_eq!(bars[0].close, 5.25);
        assert_eq!(bars[0].high, 5.5);
        assert_eq!(bars[0].low, 4.5);
        assert_eq!(bars[0].open, Some(5.0));
    }

    #[test]
    fn intraday_keeps_time_of_day() {
        let req = FetchRequest::new("X", Lookback::Days(5), Interval::Hour4, as_of());
        let bars = parse(&req, SAMPLE).unwrap();
        assert_ne!(bars[0].timestamp.time(), chrono::NaiveTime::MIN);
    }

    #[test]
    fn not_found_error() {
        let req = FetchRequest::new("NOPE", Lookback::Days(5), Interval::Day1, as_of());
        let json = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found"}}}"#;
        assert_eq!(
            parse(&req, json).unwrap_err(),
            DataError::SymbolNotFound {
                symbol: "NOPE".into()
            }
        );
    }

    #[test]
    fn no_timestamps_is_empty() {
        let req = FetchRequest::new("X", Lookback::Days(5), Interval::Day1, as_of());
        let json = r#"{"chart":{"result":[{"indicators":{"quote":[{}]}}],"error":null}}"#;
        assert_eq!(
            parse(&req, json).unwrap_err(),
            DataError::Empty { symbol: "X".into() }
        );
    }
}
