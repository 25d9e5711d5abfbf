//! TOML configuration and service wiring.
//!
//! The route-handler layer loads one config file and builds a
//! [`PortfolioService`](crate::portfolio::PortfolioService) from it;
//! everything else in the crate takes its collaborators as arguments.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::fx::{DolarApiRateSource, ExchangeRateService};
use crate::models::Currency;
use crate::portfolio::PortfolioService;
use crate::providers::{BinanceClient, IolClient, PortfolioProvider, PpiClient};
use crate::quotes::sources::{AlphaVantageQuoteSource, YahooQuoteSource};
use crate::quotes::{QuoteService, QuoteSource};

fn default_rate_ttl() -> Duration {
    Duration::from_secs(15 * 60)
}

/// On-disk configuration (`config.toml`). Every field has a default so a
/// missing file resolves to a usable offline config.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CarteraConfig {
    /// "USD" or "ARS". Defaults to USD.
    pub display_currency: Option<String>,
    /// How long the cached USD/ARS rate stays fresh, e.g. "15m".
    pub rate_ttl: Option<String>,
    pub providers: ProvidersConfig,
    pub quotes: QuotesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ProvidersConfig {
    pub iol: Option<IolConfig>,
    pub ppi: Option<PpiConfig>,
    pub binance: Option<BinanceConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IolConfig {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PpiConfig {
    pub api_key: String,
    pub api_secret: String,
    pub account_number: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinanceConfig {
    pub api_key: String,
    pub api_secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotesConfig {
    pub alpha_vantage_api_key: Option<String>,
    /// Yahoo needs no key; disable it to run fully keyless sources dry.
    pub yahoo: bool,
}

impl Default for QuotesConfig {
    fn default() -> Self {
        Self {
            alpha_vantage_api_key: None,
            yahoo: true,
        }
    }
}

/// Config with defaults applied and enums parsed.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub display_currency: Currency,
    pub rate_ttl: Duration,
    pub providers: ProvidersConfig,
    pub quotes: QuotesConfig,
}

impl CarteraConfig {
    /// Load from a TOML file. A missing file yields the default config.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config: {}", path.display()))
    }

    pub fn resolve(self) -> Result<ResolvedConfig> {
        let display_currency = match self.display_currency.as_deref() {
            None => Currency::Usd,
            Some(value) => parse_currency(value)?,
        };

        let rate_ttl = match self.rate_ttl.as_deref() {
            None => default_rate_ttl(),
            Some(value) => parse_duration(value)?,
        };

        Ok(ResolvedConfig {
            display_currency,
            rate_ttl,
            providers: self.providers,
            quotes: self.quotes,
        })
    }
}

impl ResolvedConfig {
    /// Build broker clients for every configured provider, in the fixed
    /// IOL, PPI, Binance order the aggregation reports them in.
    pub fn build_providers(&self) -> Vec<Arc<dyn PortfolioProvider>> {
        let mut providers: Vec<Arc<dyn PortfolioProvider>> = Vec::new();

        if let Some(iol) = &self.providers.iol {
            let mut client = IolClient::new(iol.access_token.as_str());
            if let Some(refresh) = &iol.refresh_token {
                client = client.with_refresh_token(refresh.as_str());
            }
            providers.push(Arc::new(client));
        }

        if let Some(ppi) = &self.providers.ppi {
            providers.push(Arc::new(PpiClient::new(
                ppi.api_key.as_str(),
                ppi.api_secret.as_str(),
                ppi.account_number.as_str(),
            )));
        }

        if let Some(binance) = &self.providers.binance {
            providers.push(Arc::new(BinanceClient::new(
                binance.api_key.as_str(),
                binance.api_secret.as_str(),
            )));
        }

        providers
    }

    pub fn build_quote_service(&self) -> Option<QuoteService> {
        let mut sources: Vec<Arc<dyn QuoteSource>> = Vec::new();

        if let Some(key) = &self.quotes.alpha_vantage_api_key {
            sources.push(Arc::new(AlphaVantageQuoteSource::new(key.as_str())));
        }
        if self.quotes.yahoo {
            sources.push(Arc::new(YahooQuoteSource::new()));
        }

        if sources.is_empty() {
            None
        } else {
            Some(QuoteService::new(sources))
        }
    }

    pub fn build_rate_service(&self) -> ExchangeRateService {
        ExchangeRateService::new(Arc::new(DolarApiRateSource::new())).with_ttl(self.rate_ttl)
    }

    /// Fully wired aggregation service.
    pub fn build_portfolio_service(&self) -> PortfolioService {
        let mut service = PortfolioService::new(self.build_providers(), self.build_rate_service());
        if let Some(quotes) = self.build_quote_service() {
            service = service.with_quotes(quotes);
        }
        service
    }
}

fn parse_currency(value: &str) -> Result<Currency> {
    match value.trim().to_uppercase().as_str() {
        "USD" => Ok(Currency::Usd),
        "ARS" => Ok(Currency::Ars),
        other => anyhow::bail!("Unsupported display currency: {other}. Use USD or ARS"),
    }
}

/// Parse durations like "300s", "15m", "2h", "1d".
fn parse_duration(value: &str) -> Result<Duration> {
    let value = value.trim().to_lowercase();
    let (digits, multiplier) = match value.chars().last() {
        Some('s') => (value.trim_end_matches('s'), 1u64),
        Some('m') => (value.trim_end_matches('m'), 60),
        Some('h') => (value.trim_end_matches('h'), 60 * 60),
        Some('d') => (value.trim_end_matches('d'), 24 * 60 * 60),
        _ => anyhow::bail!("Duration must end with s, m, h, or d"),
    };
    let amount: u64 = digits
        .parse()
        .with_context(|| format!("Invalid duration: {value}"))?;
    let secs = amount
        .checked_mul(multiplier)
        .context("Duration is too large")?;
    Ok(Duration::from_secs(secs))
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("cartera").join("config.toml"))
}
