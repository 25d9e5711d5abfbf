//! Binance spot exchange client.
//!
//! Balances come from the signed `/api/v3/account` endpoint; spot prices
//! from the public ticker endpoint, with USDT pairs standing in for USD.
//! Exchange balances carry no cost basis, so P&L for these positions is
//! zero by construction.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use hmac::{Hmac, Mac};
use reqwest::Client;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sha2::Sha256;
use tracing::{debug, warn};

use crate::clock::{Clock, SystemClock};
use crate::models::{AssetCategory, Currency, PortfolioAsset, Provider};

use super::{PortfolioProvider, ProviderError};

type HmacSha256 = Hmac<Sha256>;

const BINANCE_API_BASE: &str = "https://api.binance.com";
const RECV_WINDOW_MS: u32 = 5000;

/// Balances valued below this (in USD) are dust and excluded.
const DUST_THRESHOLD_USD: u32 = 1;

pub struct BinanceClient {
    client: Client,
    base_url: String,
    api_key: String,
    api_secret: SecretString,
    dust_threshold: Decimal,
    clock: Arc<dyn Clock>,
}

/// Signed `GET /api/v3/account` response, trimmed to balances.
#[derive(Debug, Deserialize)]
struct BinanceAccountResponse {
    #[serde(default)]
    balances: Vec<BinanceBalance>,
}

#[derive(Debug, Deserialize)]
struct BinanceBalance {
    asset: String,
    free: String,
    locked: String,
}

#[derive(Debug, Deserialize)]
struct BinanceTickerPrice {
    symbol: String,
    price: String,
}

impl BinanceClient {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: BINANCE_API_BASE.to_string(),
            api_key: api_key.into(),
            api_secret: SecretString::from(api_secret.into()),
            dust_threshold: Decimal::from(DUST_THRESHOLD_USD),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    pub fn with_dust_threshold(mut self, threshold: Decimal) -> Self {
        self.dust_threshold = threshold;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn http_error(e: reqwest::Error) -> ProviderError {
        ProviderError::Http {
            provider: Provider::Binance,
            source: e,
        }
    }

    fn sign(&self, query: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(self.api_secret.expose_secret().as_bytes())
            .expect("HMAC accepts any key length");
        mac.update(query.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn classify_status(status: u16, body: String) -> ProviderError {
        match status {
            401 | 403 => ProviderError::TokenExpired {
                provider: Provider::Binance,
            },
            // Binance uses 418 for auto-banned IPs on top of plain 429.
            418 | 429 => ProviderError::RateLimited {
                provider: Provider::Binance,
            },
            _ => ProviderError::Upstream {
                provider: Provider::Binance,
                status,
                body,
            },
        }
    }

    async fn get_account(&self) -> Result<BinanceAccountResponse, ProviderError> {
        let query = format!(
            "timestamp={}&recvWindow={}",
            self.clock.timestamp_millis(),
            RECV_WINDOW_MS
        );
        let signature = self.sign(&query);
        let url = format!(
            "{}/api/v3/account?{}&signature={}",
            self.base_url, query, signature
        );

        let response = self
            .client
            .get(&url)
            .header("X-MBX-APIKEY", &self.api_key)
            .send()
            .await
            .map_err(Self::http_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::classify_status(status.as_u16(), body));
        }

        response
            .json::<BinanceAccountResponse>()
            .await
            .map_err(|e| ProviderError::InvalidResponse {
                provider: Provider::Binance,
                detail: e.to_string(),
            })
    }

    /// All spot ticker prices, keyed by symbol (e.g. "BTCUSDT").
    async fn get_spot_prices(&self) -> Result<HashMap<String, Decimal>, ProviderError> {
        let url = format!("{}/api/v3/ticker/price", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(Self::http_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::classify_status(status.as_u16(), body));
        }

        let tickers: Vec<BinanceTickerPrice> =
            response
                .json()
                .await
                .map_err(|e| ProviderError::InvalidResponse {
                    provider: Provider::Binance,
                    detail: e.to_string(),
                })?;

        Ok(tickers
            .into_iter()
            .filter_map(|t| Decimal::from_str(&t.price).ok().map(|p| (t.symbol, p)))
            .collect())
    }
}

/// Display names for the common listings; everything else keeps its ticker.
fn crypto_display_name(symbol: &str) -> Option<&'static str> {
    let name = match symbol {
        "BTC" => "Bitcoin",
        "ETH" => "Ethereum",
        "BNB" => "BNB",
        "SOL" => "Solana",
        "ADA" => "Cardano",
        "XRP" => "XRP",
        "DOT" => "Polkadot",
        "DOGE" => "Dogecoin",
        "AVAX" => "Avalanche",
        "MATIC" => "Polygon",
        "LTC" => "Litecoin",
        "LINK" => "Chainlink",
        "ATOM" => "Cosmos",
        "UNI" => "Uniswap",
        "USDT" => "Tether",
        "USDC" => "USD Coin",
        "DAI" => "Dai",
        "BUSD" => "Binance USD",
        _ => return None,
    };
    Some(name)
}

fn is_usd_stable(symbol: &str) -> bool {
    matches!(symbol, "USDT" | "USDC" | "DAI" | "BUSD" | "FDUSD" | "TUSD")
}

fn parse_amount(value: &str) -> Decimal {
    Decimal::from_str(value).unwrap_or(Decimal::ZERO)
}

fn map_balance(
    balance: &BinanceBalance,
    prices: &HashMap<String, Decimal>,
    dust_threshold: Decimal,
) -> Option<PortfolioAsset> {
    let symbol = balance.asset.trim().to_uppercase();
    if symbol.is_empty() {
        return None;
    }

    let free = parse_amount(&balance.free);
    let locked = parse_amount(&balance.locked);
    let quantity = free + locked;
    if quantity <= Decimal::ZERO {
        return None;
    }

    // USDT pairs stand in for USD pricing; stables are pinned to 1.
    let price = if is_usd_stable(&symbol) {
        Decimal::ONE
    } else {
        prices
            .get(&format!("{symbol}USDT"))
            .copied()
            .unwrap_or(Decimal::ZERO)
    };

    // Dust is only decidable once a price is known; unpriced balances stay
    // in so the quote overlay can still value them.
    if price > Decimal::ZERO && quantity * price < dust_threshold {
        debug!(symbol = %symbol, "skipping dust balance");
        return None;
    }

    let mut asset = PortfolioAsset::new(
        Provider::Binance,
        symbol.clone(),
        AssetCategory::Crypto,
        Currency::Usd,
        quantity,
        Decimal::ZERO,
        price,
    )
    .with_locked(locked);

    if let Some(name) = crypto_display_name(&symbol) {
        asset = asset.with_name(name);
    }

    Some(asset)
}

#[async_trait::async_trait]
impl PortfolioProvider for BinanceClient {
    fn provider(&self) -> Provider {
        Provider::Binance
    }

    async fn fetch_positions(&self) -> Result<Vec<PortfolioAsset>, ProviderError> {
        let account = self.get_account().await?;

        // Prices are an enrichment; balances without them are still
        // reported (with a zero price) rather than failing the provider.
        let prices = match self.get_spot_prices().await {
            Ok(prices) => prices,
            Err(e) => {
                warn!(error = %e, "binance ticker prices unavailable");
                HashMap::new()
            }
        };

        let positions: Vec<PortfolioAsset> = account
            .balances
            .iter()
            .filter_map(|b| map_balance(b, &prices, self.dust_threshold))
            .collect();

        debug!(positions = positions.len(), "binance balances mapped");
        Ok(positions)
    }
}
