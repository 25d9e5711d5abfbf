// src/quotes/mod.rs
mod overlay;
pub mod sources;

pub use overlay::apply_quotes;

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use futures::future::join_all;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::models::AssetCategory;

/// Quotes are fetched this many tickers at a time; each batch settles
/// fully before the next one starts, bounding outbound connections.
pub const QUOTE_BATCH_SIZE: usize = 8;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub price: Decimal,
    pub change_percent: Decimal,
    pub previous_close: Decimal,
}

/// A live quote lookup. `Ok(None)` means the source does not cover this
/// ticker; errors are isolated per ticker by the service.
#[async_trait::async_trait]
pub trait QuoteSource: Send + Sync {
    async fn quote(&self, ticker: &str, category: AssetCategory) -> Result<Option<Quote>>;

    fn name(&self) -> &str;
}

/// Fans quote lookups out over the configured sources, in declaration
/// order, batching requests and swallowing per-ticker failures.
pub struct QuoteService {
    sources: Vec<Arc<dyn QuoteSource>>,
}

impl QuoteService {
    pub fn new(sources: Vec<Arc<dyn QuoteSource>>) -> Self {
        Self { sources }
    }

    /// Fetch quotes for the given tickers. Missing or failed lookups are
    /// simply absent from the result; a stale price is not an error.
    pub async fn fetch_quotes(
        &self,
        requests: &[(String, AssetCategory)],
    ) -> HashMap<String, Quote> {
        let mut quotes = HashMap::new();

        for batch in requests.chunks(QUOTE_BATCH_SIZE) {
            let lookups = batch
                .iter()
                .map(|(ticker, category)| self.quote_with_fallback(ticker, *category));

            for (request, quote) in batch.iter().zip(join_all(lookups).await) {
                if let Some(quote) = quote {
                    quotes.insert(request.0.clone(), quote);
                }
            }
        }

        debug!(
            requested = requests.len(),
            resolved = quotes.len(),
            "quote batch fetch complete"
        );
        quotes
    }

    async fn quote_with_fallback(&self, ticker: &str, category: AssetCategory) -> Option<Quote> {
        for source in &self.sources {
            match source.quote(ticker, category).await {
                Ok(Some(quote)) => return Some(quote),
                Ok(None) => continue,
                Err(e) => {
                    warn!(ticker, source = source.name(), error = %e, "quote lookup failed");
                    continue;
                }
            }
        }
        None
    }
}
