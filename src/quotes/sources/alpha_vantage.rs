//! Alpha Vantage equity quote source.
//!
//! Uses the GLOBAL_QUOTE endpoint, which returns the latest price along
//! with the previous close and the day's percent change, which is the
//! shape the overlay needs. Free tier is limited to 25 requests/day.

use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;

use crate::models::AssetCategory;
use crate::quotes::{Quote, QuoteSource};

const BASE_URL: &str = "https://www.alphavantage.co/query";

/// `GLOBAL_QUOTE` response envelope.
#[derive(Debug, Deserialize)]
struct GlobalQuoteResponse {
    #[serde(rename = "Global Quote")]
    global_quote: Option<GlobalQuote>,
}

#[derive(Debug, Deserialize)]
struct GlobalQuote {
    #[allow(dead_code)]
    #[serde(rename = "01. symbol", default)]
    symbol: String,
    #[serde(rename = "05. price", default)]
    price: String,
    #[serde(rename = "08. previous close", default)]
    previous_close: String,
    #[serde(rename = "10. change percent", default)]
    change_percent: String,
}

/// Rate-limit note or error payload returned with a 200 status.
#[derive(Debug, Deserialize)]
struct ApiNoteResponse {
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
}

pub struct AlphaVantageQuoteSource {
    api_key: String,
    client: Client,
    base_url: String,
}

impl AlphaVantageQuoteSource {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
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

    fn parse_quote(quote: &GlobalQuote) -> Result<Quote> {
        let price = Decimal::from_str(quote.price.trim())
            .with_context(|| format!("Invalid price: {}", quote.price))?;
        let previous_close = Decimal::from_str(quote.previous_close.trim())
            .with_context(|| format!("Invalid previous close: {}", quote.previous_close))?;
        // The percent field arrives as e.g. "1.2345%".
        let change_percent = Decimal::from_str(quote.change_percent.trim().trim_end_matches('%'))
            .with_context(|| format!("Invalid change percent: {}", quote.change_percent))?;

        Ok(Quote {
            price,
            change_percent,
            previous_close,
        })
    }
}

#[async_trait::async_trait]
impl QuoteSource for AlphaVantageQuoteSource {
    async fn quote(&self, ticker: &str, category: AssetCategory) -> Result<Option<Quote>> {
        // Alpha Vantage covers listed equities; crypto and cash go elsewhere.
        if !matches!(category, AssetCategory::Stock | AssetCategory::Cedear) {
            return Ok(None);
        }

        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("function", "GLOBAL_QUOTE"),
                ("symbol", &ticker.to_uppercase()),
                ("apikey", &self.api_key),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "Alpha Vantage request failed with status {}",
                response.status()
            ));
        }

        let text = response.text().await?;

        // Throttle responses come back as 200s with a note payload.
        if let Ok(note) = serde_json::from_str::<ApiNoteResponse>(&text) {
            if let Some(message) = note.note.or(note.error_message).or(note.information) {
                return Err(anyhow!("Alpha Vantage: {message}"));
            }
        }

        let parsed: GlobalQuoteResponse =
            serde_json::from_str(&text).context("Failed to parse GLOBAL_QUOTE response")?;

        let Some(quote) = parsed.global_quote else {
            return Ok(None);
        };
        if quote.price.trim().is_empty() {
            // An empty object means the symbol is unknown.
            return Ok(None);
        }

        Ok(Some(Self::parse_quote(&quote)?))
    }

    fn name(&self) -> &str {
        "alpha_vantage"
    }
}
