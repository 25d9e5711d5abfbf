//! Yahoo Finance quote source.
//!
//! Uses the v8 chart endpoint, which needs no API key. BYMA-listed
//! equities and CEDEARs take the `.BA` suffix; crypto uses the `-USD`
//! pairs. The day change is derived from the previous close.

use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::models::AssetCategory;
use crate::providers::decimal_from_f64;
use crate::quotes::{Quote, QuoteSource};

const BASE_URL: &str = "https://query1.finance.yahoo.com";

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    #[serde(rename = "regularMarketPrice")]
    regular_market_price: Option<f64>,
    #[serde(rename = "chartPreviousClose")]
    chart_previous_close: Option<f64>,
    #[serde(rename = "previousClose")]
    previous_close: Option<f64>,
}

pub struct YahooQuoteSource {
    client: Client,
    base_url: String,
}

impl YahooQuoteSource {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_url: BASE_URL.to_string(),
        }
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Yahoo symbol for a ticker in our universe. Cash has no quote.
    fn symbol_for(ticker: &str, category: AssetCategory) -> Option<String> {
        let ticker = ticker.to_uppercase();
        match category {
            AssetCategory::Crypto => Some(format!("{ticker}-USD")),
            AssetCategory::Stock | AssetCategory::Cedear => Some(format!("{ticker}.BA")),
            AssetCategory::Cash => None,
        }
    }

    fn quote_from_meta(meta: &ChartMeta) -> Option<Quote> {
        let price = meta.regular_market_price.filter(|p| p.is_finite())?;
        let previous = meta
            .chart_previous_close
            .or(meta.previous_close)
            .filter(|p| p.is_finite() && *p > 0.0);

        let price_dec = decimal_from_f64(price);
        let (previous_close, change_percent) = match previous {
            Some(prev) => {
                let prev_dec = decimal_from_f64(prev);
                let change = ((price_dec - prev_dec) / prev_dec * Decimal::from(100)).round_dp(4);
                (prev_dec, change)
            }
            None => (price_dec, Decimal::ZERO),
        };

        Some(Quote {
            price: price_dec,
            change_percent,
            previous_close,
        })
    }
}

impl Default for YahooQuoteSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl QuoteSource for YahooQuoteSource {
    async fn quote(&self, ticker: &str, category: AssetCategory) -> Result<Option<Quote>> {
        let Some(symbol) = Self::symbol_for(ticker, category) else {
            return Ok(None);
        };

        let url = format!(
            "{}/v8/finance/chart/{}?interval=1d&range=1d",
            self.base_url, symbol
        );

        let response = self
            .client
            .get(&url)
            .header("User-Agent", "cartera/0.3 (+https://github.com/cartera-app/cartera)")
            .send()
            .await?;

        // Unknown symbols come back as 404 with an error envelope.
        if response.status().as_u16() == 404 {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(anyhow!(
                "Yahoo chart request for {symbol} failed with status {}",
                response.status()
            ));
        }

        let parsed: ChartResponse = response
            .json()
            .await
            .context("Failed to parse Yahoo chart response")?;

        if parsed.chart.error.is_some() {
            return Ok(None);
        }

        let Some(result) = parsed.chart.result.and_then(|mut r| {
            if r.is_empty() {
                None
            } else {
                Some(r.remove(0))
            }
        }) else {
            return Ok(None);
        };

        Ok(Self::quote_from_meta(&result.meta))
    }

    fn name(&self) -> &str {
        "yahoo"
    }
}
