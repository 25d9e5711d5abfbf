//! USD/ARS exchange rate lookup with a TTL cache and a fixed fallback.
//!
//! The MEP rate comes from DolarApi's "bolsa" quote. The service never
//! fails an aggregation over a missing rate: when the source is down the
//! hardcoded fallback is returned, flagged by its source string.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::clock::{Clock, SystemClock};

use super::TtlCache;

const DOLARAPI_BASE_URL: &str = "https://dolarapi.com";

/// Last-resort ARS-per-USD rate when no source is reachable.
pub const FALLBACK_ARS_PER_USD: u32 = 1000;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeRate {
    /// ARS per USD.
    pub rate: Decimal,
    pub updated_at: DateTime<Utc>,
    pub source: String,
}

#[async_trait::async_trait]
pub trait RateSource: Send + Sync {
    /// `Ok(None)` means the source answered but had no usable quote.
    async fn fetch_rate(&self) -> Result<Option<ExchangeRate>>;

    fn name(&self) -> &str;
}

/// DolarApi response for a single quote type.
#[derive(Debug, Deserialize)]
struct DolarApiResponse {
    #[allow(dead_code)]
    casa: String,
    compra: f64,
    venta: f64,
    #[serde(rename = "fechaActualizacion")]
    fecha_actualizacion: DateTime<Utc>,
}

/// MEP rate source backed by the free DolarApi service.
#[derive(Debug, Clone)]
pub struct DolarApiRateSource {
    client: Client,
    base_url: String,
}

impl DolarApiRateSource {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_url: DOLARAPI_BASE_URL.to_string(),
        }
    }

    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            base_url: DOLARAPI_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn mid_rate(compra: f64, venta: f64) -> Option<Decimal> {
        let mid = (compra + venta) / 2.0;
        if !mid.is_finite() || mid <= 0.0 {
            return None;
        }
        Decimal::from_f64_retain(mid)
    }
}

impl Default for DolarApiRateSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl RateSource for DolarApiRateSource {
    async fn fetch_rate(&self) -> Result<Option<ExchangeRate>> {
        let url = format!("{}/v1/dolares/bolsa", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("DolarApi request failed")?
            .error_for_status()
            .context("DolarApi returned an error status")?
            .json::<DolarApiResponse>()
            .await
            .context("Failed to parse DolarApi response")?;

        let Some(rate) = Self::mid_rate(response.compra, response.venta) else {
            return Ok(None);
        };

        Ok(Some(ExchangeRate {
            rate,
            updated_at: response.fecha_actualizacion,
            source: self.name().to_string(),
        }))
    }

    fn name(&self) -> &str {
        "dolarapi"
    }
}

/// Exchange rate lookup with an explicit, clock-injected TTL cache.
pub struct ExchangeRateService {
    source: Option<Arc<dyn RateSource>>,
    cache: TtlCache<ExchangeRate>,
    clock: Arc<dyn Clock>,
}

impl ExchangeRateService {
    const DEFAULT_TTL: Duration = Duration::from_secs(15 * 60);

    pub fn new(source: Arc<dyn RateSource>) -> Self {
        Self::build(Some(source), Self::DEFAULT_TTL, Arc::new(SystemClock))
    }

    /// A service that always answers with the fallback rate. Used when no
    /// rate source is configured.
    pub fn offline() -> Self {
        Self::build(None, Self::DEFAULT_TTL, Arc::new(SystemClock))
    }

    pub fn with_ttl(self, ttl: Duration) -> Self {
        Self::build(self.source, ttl, self.clock)
    }

    pub fn with_clock(self, clock: Arc<dyn Clock>) -> Self {
        let ttl = self.cache.ttl();
        Self::build(self.source, ttl, clock)
    }

    fn build(source: Option<Arc<dyn RateSource>>, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            source,
            cache: TtlCache::new(ttl, clock.clone()),
            clock,
        }
    }

    fn fallback(&self) -> ExchangeRate {
        ExchangeRate {
            rate: Decimal::from(FALLBACK_ARS_PER_USD),
            updated_at: self.clock.now(),
            source: "fallback".to_string(),
        }
    }

    /// Current ARS-per-USD rate: cached, then fetched, then the fallback
    /// constant. Fallback values are not cached, so the next call retries
    /// the source.
    pub async fn current_rate(&self) -> ExchangeRate {
        if let Some(cached) = self.cache.get() {
            debug!(rate = %cached.rate, source = %cached.source, "exchange rate cache hit");
            return cached;
        }

        let Some(source) = &self.source else {
            return self.fallback();
        };

        match source.fetch_rate().await {
            Ok(Some(rate)) => {
                debug!(rate = %rate.rate, source = %rate.source, "exchange rate fetched");
                self.cache.put(rate.clone());
                rate
            }
            Ok(None) => {
                warn!(source = source.name(), "rate source had no usable quote, using fallback");
                self.fallback()
            }
            Err(e) => {
                warn!(source = source.name(), error = %e, "rate fetch failed, using fallback");
                self.fallback()
            }
        }
    }
}
