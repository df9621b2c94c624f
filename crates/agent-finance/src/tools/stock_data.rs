//! Tool fetching price history with an indicator snapshot

use super::{names, parse_args};
use crate::api::{Quote, YahooFinanceClient};
use crate::error::{FinanceError, Result};
use agent_core::ToolError;
use agent_tools::Tool;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;
use ta::{
    Next,
    indicators::{RelativeStrengthIndex, SimpleMovingAverage},
};

/// Trading days per year, for annualising volatility
const TRADING_DAYS: f64 = 252.0;

/// Tool for fetching stock price data and technical indicators
#[derive(Debug, Clone)]
pub struct StockDataTool {
    yahoo_client: YahooFinanceClient,
    ttl: Duration,
}

#[derive(Debug, Deserialize)]
struct StockDataParams {
    symbol: String,
    #[serde(default)]
    range: Option<String>,
}

/// Normalize a symbol; bare six digit KRX codes get the KOSPI suffix
pub fn normalize_symbol(symbol: &str) -> Result<String> {
    let symbol = symbol.trim().to_uppercase();
    if symbol.is_empty() {
        return Err(FinanceError::InvalidSymbol(symbol));
    }
    if symbol.len() == 6 && symbol.chars().all(|c| c.is_ascii_digit()) {
        return Ok(format!("{symbol}.KS"));
    }
    if !symbol
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^'))
    {
        return Err(FinanceError::InvalidSymbol(symbol));
    }
    Ok(symbol)
}

/// Last value of a simple moving average, if the history covers the period
fn sma(closes: &[f64], period: usize) -> Result<Option<f64>> {
    if closes.len() < period {
        return Ok(None);
    }
    let mut sma = SimpleMovingAverage::new(period)
        .map_err(|e| FinanceError::IndicatorError(e.to_string()))?;
    Ok(closes.iter().map(|&close| sma.next(close)).last())
}

fn rsi(closes: &[f64], period: usize) -> Result<Option<f64>> {
    if closes.len() <= period {
        return Ok(None);
    }
    let mut rsi = RelativeStrengthIndex::new(period)
        .map_err(|e| FinanceError::IndicatorError(e.to_string()))?;
    Ok(closes.iter().map(|&close| rsi.next(close)).last())
}

/// Annualised standard deviation of daily returns, in percent
fn volatility(closes: &[f64]) -> Option<f64> {
    let returns: Vec<f64> = closes
        .windows(2)
        .filter(|w| w[0] > 0.0)
        .map(|w| w[1] / w[0] - 1.0)
        .collect();
    if returns.len() < 2 {
        return None;
    }
    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some(variance.sqrt() * TRADING_DAYS.sqrt() * 100.0)
}

fn percent_change(from: f64, to: f64) -> Option<f64> {
    (from > 0.0).then(|| (to / from - 1.0) * 100.0)
}

/// Interpret RSI value
fn interpret_rsi(rsi: f64) -> &'static str {
    if rsi > 70.0 {
        "overbought"
    } else if rsi < 30.0 {
        "oversold"
    } else {
        "neutral"
    }
}

/// Summarize a price history into the snapshot returned by the tool
pub fn snapshot(symbol: &str, range: &str, quotes: &[Quote]) -> Result<Value> {
    let (Some(first), Some(last)) = (quotes.first(), quotes.last()) else {
        return Err(FinanceError::DataUnavailable {
            symbol: symbol.to_string(),
            reason: "No historical data available".to_string(),
        });
    };

    let closes: Vec<f64> = quotes.iter().map(|q| q.close).collect();
    let previous_close = quotes
        .len()
        .checked_sub(2)
        .map(|i| quotes[i].close);
    let high = quotes.iter().map(|q| q.high).fold(f64::MIN, f64::max);
    let low = quotes.iter().map(|q| q.low).fold(f64::MAX, f64::min);
    let rsi14 = rsi(&closes, 14)?;

    Ok(json!({
        "symbol": symbol,
        "range": range,
        "as_of": last.timestamp.format("%Y-%m-%d").to_string(),
        "data_points": quotes.len(),
        "last_close": last.close,
        "daily_change_pct": previous_close.and_then(|prev| percent_change(prev, last.close)),
        "period_change_pct": percent_change(first.close, last.close),
        "period_high": high,
        "period_low": low,
        "sma20": sma(&closes, 20)?,
        "sma50": sma(&closes, 50)?,
        "rsi14": rsi14,
        "rsi_signal": rsi14.map(interpret_rsi),
        "volatility_pct": volatility(&closes),
        "closes": &closes[closes.len().saturating_sub(30)..],
    }))
}

impl StockDataTool {
    /// Create a new stock data tool
    pub fn new(ttl: Duration) -> Self {
        Self {
            yahoo_client: YahooFinanceClient::new(),
            ttl,
        }
    }

    async fn fetch(&self, params: StockDataParams) -> Result<Value> {
        let symbol = normalize_symbol(&params.symbol)?;
        let range = params.range.unwrap_or_else(|| "3mo".to_string());

        let quotes = self
            .yahoo_client
            .get_historical_range(&symbol, &range)
            .await?;

        snapshot(&symbol, &range, &quotes)
    }
}

#[async_trait]
impl Tool for StockDataTool {
    async fn call(&self, args: Value) -> std::result::Result<Value, ToolError> {
        let params: StockDataParams = parse_args(self.name(), args)?;
        self.fetch(params)
            .await
            .map_err(|e| e.into_tool_error(names::STOCK_DATA))
    }

    fn name(&self) -> &str {
        names::STOCK_DATA
    }

    fn description(&self) -> &str {
        "Fetch daily price history for a listed company and summarize it: \
         last close, changes, moving averages, RSI and volatility."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "symbol": {
                    "type": "string",
                    "description": "Six digit KRX code or Yahoo Finance symbol"
                },
                "range": {
                    "type": "string",
                    "description": "Time range for historical data",
                    "enum": ["1mo", "3mo", "6mo", "1y", "ytd"],
                    "default": "3mo"
                }
            },
            "required": ["symbol"]
        })
    }

    fn ttl(&self) -> Option<Duration> {
        Some(self.ttl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, TimeZone, Utc};

    fn quotes(closes: &[f64]) -> Vec<Quote> {
        let start = Utc.with_ymd_and_hms(2025, 1, 2, 0, 0, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Quote {
                symbol: "105560.KS".to_string(),
                timestamp: start + ChronoDuration::days(i as i64),
                open: close,
                high: close * 1.01,
                low: close * 0.99,
                close,
                volume: 1_000,
                adjclose: close,
            })
            .collect()
    }

    #[test]
    fn test_normalize_symbol() {
        assert_eq!(normalize_symbol("105560").unwrap(), "105560.KS");
        assert_eq!(normalize_symbol(" aapl ").unwrap(), "AAPL");
        assert_eq!(normalize_symbol("005930.ks").unwrap(), "005930.KS");
        assert!(normalize_symbol("").is_err());
        assert!(normalize_symbol("KB 금융").is_err());
    }

    #[test]
    fn test_snapshot_indicators() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + f64::from(i)).collect();
        let value = snapshot("105560.KS", "3mo", &quotes(&closes)).unwrap();

        assert_eq!(value["data_points"], 60);
        assert_eq!(value["last_close"], 159.0);
        assert_eq!(value["as_of"], "2025-03-02");
        assert!(value["sma20"].as_f64().unwrap() < 159.0);
        assert!(value["sma50"].is_number());
        // monotonic rise
        assert!(value["rsi14"].as_f64().unwrap() > 70.0);
        assert_eq!(value["rsi_signal"], "overbought");
        assert_eq!(value["closes"].as_array().unwrap().len(), 30);
    }

    #[test]
    fn test_snapshot_short_history() {
        let value = snapshot("X", "1mo", &quotes(&[100.0, 110.0])).unwrap();
        assert!(value["sma20"].is_null());
        assert!(value["rsi14"].is_null());
        assert!(value["volatility_pct"].is_null());
        let change = value["daily_change_pct"].as_f64().unwrap();
        assert!((change - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_snapshot_empty_history() {
        let err = snapshot("X", "1mo", &[]).unwrap_err();
        assert!(matches!(err, FinanceError::DataUnavailable { .. }));
        assert!(!err.into_tool_error("stock_data").is_retriable());
    }

    #[test]
    fn test_volatility() {
        assert!(volatility(&[100.0, 100.0, 100.0]).unwrap().abs() < 1e-12);
        assert!(volatility(&[100.0, 110.0, 95.0, 105.0]).unwrap() > 0.0);
    }

    #[tokio::test]
    async fn test_invalid_symbol_is_fatal() {
        let tool = StockDataTool::new(Duration::from_secs(900));
        let err = tool.call(json!({"symbol": "$$$"})).await.unwrap_err();
        assert!(!err.is_retriable());
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn test_fetch_kospi_listing() {
        let tool = StockDataTool::new(Duration::from_secs(900));
        let value = tool.call(json!({"symbol": "105560"})).await.unwrap();
        assert_eq!(value["symbol"], "105560.KS");
    }
}
