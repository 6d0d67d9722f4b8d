//! Public Binance spot REST market data (no auth), plus CoinGecko's global
//! endpoint for BTC dominance.

use crate::infrastructure::http::{classify_status, classify_transport};
use crate::domain::error::ReviewError;
use crate::domain::ports::market_data::*;
use crate::domain::values::strategy::CoinUniverse;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;

pub const DEFAULT_BASE_URL: &str = "https://api.binance.com";
pub const DEFAULT_GLOBAL_URL: &str = "https://api.coingecko.com/api/v3/global";

/// Base assets excluded from discovery: stablecoins and wrapped duplicates.
const EXCLUDED_BASES: &[&str] = &["USDC", "FDUSD", "TUSD", "USDP", "DAI", "EUR", "WBTC", "WBETH"];

pub struct BinanceMarketData {
    client: Client,
    base_url: String,
    global_url: String,
    quote_asset: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Ticker24h {
    symbol: String,
    last_price: String,
    price_change_percent: String,
    high_price: String,
    low_price: String,
    quote_volume: String,
}

#[derive(Debug, Deserialize)]
struct Depth {
    bids: Vec<[String; 2]>,
    asks: Vec<[String; 2]>,
}

#[derive(Debug, Deserialize)]
struct GlobalResponse {
    data: GlobalData,
}

#[derive(Debug, Deserialize)]
struct GlobalData {
    #[serde(default)]
    market_cap_percentage: std::collections::HashMap<String, f64>,
}

fn num(field: &str, s: &str) -> Result<f64, ReviewError> {
    s.parse::<f64>()
        .map_err(|_| ReviewError::Validation(format!("Binance field {field} is not a number: {s}")))
}

fn json_num(field: &str, v: &serde_json::Value) -> Result<f64, ReviewError> {
    match v {
        serde_json::Value::String(s) => num(field, s),
        serde_json::Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| ReviewError::Validation(format!("Binance field {field} out of range"))),
        _ => Err(ReviewError::Validation(format!("Binance field {field} has unexpected type"))),
    }
}

impl Ticker24h {
    fn into_ticker(self) -> Result<Ticker, ReviewError> {
        Ok(Ticker {
            last_price: num("lastPrice", &self.last_price)?,
            price_change_pct_24h: num("priceChangePercent", &self.price_change_percent)?,
            high_24h: num("highPrice", &self.high_price)?,
            low_24h: num("lowPrice", &self.low_price)?,
            quote_volume_24h: num("quoteVolume", &self.quote_volume)?,
            symbol: self.symbol,
        })
    }
}

impl BinanceMarketData {
    pub fn new(base_url: Option<String>, global_url: Option<String>) -> Self {
        Self {
            client: Client::builder()
                .user_agent("cryptoadvisor/0.1")
                .build()
                .unwrap_or_default(),
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            global_url: global_url.unwrap_or_else(|| DEFAULT_GLOBAL_URL.to_string()),
            quote_asset: "USDT".to_string(),
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, query: &[(&str, String)]) -> Result<T, ReviewError> {
        let resp = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| classify_transport("Binance", e))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(classify_status("Binance", status, &body));
        }
        resp.json().await.map_err(|e| classify_transport("Binance", e))
    }

    fn is_tradable_base(&self, symbol: &str) -> bool {
        let Some(base) = symbol.strip_suffix(self.quote_asset.as_str()) else {
            return false;
        };
        !base.is_empty()
            && !EXCLUDED_BASES.contains(&base)
            && !base.ends_with("UP")
            && !base.ends_with("DOWN")
    }

    async fn klines(&self, symbol: &str, interval: &str, limit: usize) -> Result<Vec<Candle>, ReviewError> {
        let rows: Vec<Vec<serde_json::Value>> = self
            .get_json(
                &format!("{}/api/v3/klines", self.base_url),
                &[
                    ("symbol", symbol.to_uppercase()),
                    ("interval", interval.to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;

        rows.iter()
            .map(|row| {
                if row.len() < 6 {
                    return Err(ReviewError::Validation(format!("Short kline row for {symbol}")));
                }
                Ok(Candle {
                    open_time_ms: row[0].as_i64().unwrap_or_default(),
                    open: json_num("open", &row[1])?,
                    high: json_num("high", &row[2])?,
                    low: json_num("low", &row[3])?,
                    close: json_num("close", &row[4])?,
                    volume: json_num("volume", &row[5])?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl MarketDataProvider for BinanceMarketData {
    fn name(&self) -> &str {
        "binance"
    }

    async fn universe(&self, universe: CoinUniverse) -> Result<Vec<String>, ReviewError> {
        let all: Vec<Ticker24h> = self
            .get_json(&format!("{}/api/v3/ticker/24hr", self.base_url), &[])
            .await?;
        let mut ranked: Vec<(String, f64)> = all
            .into_iter()
            .filter(|t| self.is_tradable_base(&t.symbol))
            .filter_map(|t| t.quote_volume.parse::<f64>().ok().map(|v| (t.symbol, v)))
            .collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        Ok(ranked
            .into_iter()
            .take(universe.size())
            .map(|(symbol, _)| symbol)
            .collect())
    }

    async fn ticker(&self, symbol: &str) -> Result<Ticker, ReviewError> {
        let raw: Ticker24h = self
            .get_json(
                &format!("{}/api/v3/ticker/24hr", self.base_url),
                &[("symbol", symbol.to_uppercase())],
            )
            .await?;
        raw.into_ticker()
    }

    async fn candles(&self, symbol: &str, limit: usize) -> Result<Vec<Candle>, ReviewError> {
        self.klines(symbol, "1h", limit).await
    }

    async fn order_book(&self, symbol: &str, depth: usize) -> Result<OrderBookDepth, ReviewError> {
        let book: Depth = self
            .get_json(
                &format!("{}/api/v3/depth", self.base_url),
                &[("symbol", symbol.to_uppercase()), ("limit", depth.to_string())],
            )
            .await?;

        let side_value = |levels: &[[String; 2]]| -> Result<f64, ReviewError> {
            levels.iter().try_fold(0.0, |acc, [price, qty]| {
                Ok(acc + num("price", price)? * num("qty", qty)?)
            })
        };
        let best = |levels: &[[String; 2]]| -> Result<f64, ReviewError> {
            levels.first().map_or(Ok(0.0), |[price, _]| num("price", price))
        };
        Ok(OrderBookDepth {
            bid_value: side_value(&book.bids)?,
            ask_value: side_value(&book.asks)?,
            best_bid: best(&book.bids)?,
            best_ask: best(&book.asks)?,
        })
    }

    async fn global_metrics(&self) -> Result<GlobalMetrics, ReviewError> {
        let global: GlobalResponse = self.get_json(&self.global_url, &[]).await?;
        let btc_dominance_pct = global.data.market_cap_percentage.get("btc").copied().unwrap_or(0.0);

        let benchmark = format!("BTC{}", self.quote_asset);
        let daily = self.klines(&benchmark, "1d", 2).await?;
        let volume_change_pct_24h = match daily.as_slice() {
            [prev, last] if prev.volume > 0.0 => (last.volume - prev.volume) / prev.volume * 100.0,
            _ => 0.0,
        };

        Ok(GlobalMetrics {
            btc_dominance_pct,
            volume_change_pct_24h,
            news_rate_per_hour: 0.0,
            significant_news: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tradable_base_filter() {
        let md = BinanceMarketData::new(None, None);
        assert!(md.is_tradable_base("BTCUSDT"));
        assert!(!md.is_tradable_base("USDCUSDT"));
        assert!(!md.is_tradable_base("BTCUPUSDT"));
        assert!(!md.is_tradable_base("ETHBTC"));
    }

    #[test]
    fn test_status_classification() {
        assert!(classify_status("Binance", reqwest::StatusCode::TOO_MANY_REQUESTS, "").is_transient());
        assert!(classify_status("Binance", reqwest::StatusCode::BAD_GATEWAY, "").is_transient());
        assert!(!classify_status("Binance", reqwest::StatusCode::BAD_REQUEST, "bad symbol").is_transient());
    }
}
