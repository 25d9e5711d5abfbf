// src/providers/mod.rs
mod binance;
mod iol;
mod ppi;

pub use binance::BinanceClient;
pub use iol::IolClient;
pub use ppi::PpiClient;

use std::sync::Arc;

use futures::future::join_all;
use tracing::{info, warn};

use crate::models::{PortfolioAsset, Provider, ProviderStatus};
use crate::retry::{retry_transient, RetryPolicy};

/// Errors a broker client can surface. Auth failures are distinguished so
/// callers can prompt a reconnect instead of showing a generic error.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("{provider} session expired; reconnect required")]
    TokenExpired { provider: Provider },

    #[error("{provider} rate limited the request")]
    RateLimited { provider: Provider },

    #[error("{provider} request failed: {source}")]
    Http {
        provider: Provider,
        #[source]
        source: reqwest::Error,
    },

    #[error("{provider} returned status {status}: {body}")]
    Upstream {
        provider: Provider,
        status: u16,
        body: String,
    },

    #[error("{provider} response did not match the expected shape: {detail}")]
    InvalidResponse { provider: Provider, detail: String },
}

impl ProviderError {
    pub fn provider(&self) -> Provider {
        match self {
            ProviderError::TokenExpired { provider }
            | ProviderError::RateLimited { provider }
            | ProviderError::Http { provider, .. }
            | ProviderError::Upstream { provider, .. }
            | ProviderError::InvalidResponse { provider, .. } => *provider,
        }
    }

    /// Transient errors are worth retrying; auth and shape errors are not.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::RateLimited { .. } => true,
            ProviderError::Http { .. } => true,
            ProviderError::Upstream { status, .. } => *status >= 500,
            ProviderError::TokenExpired { .. } | ProviderError::InvalidResponse { .. } => false,
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, ProviderError::TokenExpired { .. })
    }

    /// Classify a non-success HTTP status from a broker API.
    pub(crate) fn from_status(provider: Provider, status: u16, body: String) -> Self {
        match status {
            401 | 403 => ProviderError::TokenExpired { provider },
            429 => ProviderError::RateLimited { provider },
            _ => ProviderError::Upstream {
                provider,
                status,
                body,
            },
        }
    }
}

/// Lossy-but-total conversion for provider floats. Broker APIs report JSON
/// numbers; a non-finite value maps to zero rather than poisoning the
/// whole response.
pub(crate) fn decimal_from_f64(value: f64) -> rust_decimal::Decimal {
    rust_decimal::Decimal::from_f64_retain(value).unwrap_or(rust_decimal::Decimal::ZERO)
}

/// A broker client that can report current positions in the canonical
/// shape.
#[async_trait::async_trait]
pub trait PortfolioProvider: Send + Sync {
    fn provider(&self) -> Provider;

    async fn fetch_positions(&self) -> Result<Vec<PortfolioAsset>, ProviderError>;
}

/// Outcome of one provider's fetch within an aggregation request.
#[derive(Debug, Clone)]
pub struct ProviderFetch {
    pub status: ProviderStatus,
    pub assets: Vec<PortfolioAsset>,
}

/// Fetch all providers concurrently. A failing provider contributes an
/// empty list and a disconnected status instead of failing the request;
/// transient failures are retried per the policy first.
pub async fn fetch_all(
    providers: &[Arc<dyn PortfolioProvider>],
    policy: &RetryPolicy,
) -> Vec<ProviderFetch> {
    let fetches = providers.iter().map(|p| {
        let provider = p.provider();
        async move {
            match retry_transient(policy, || p.fetch_positions()).await {
                Ok(assets) => {
                    info!(provider = %provider, positions = assets.len(), "provider fetch ok");
                    ProviderFetch {
                        status: ProviderStatus::connected(provider),
                        assets,
                    }
                }
                Err(e) => {
                    warn!(provider = %provider, auth = e.is_auth(), error = %e, "provider fetch failed");
                    ProviderFetch {
                        status: ProviderStatus::failed(provider, e.to_string()),
                        assets: Vec::new(),
                    }
                }
            }
        }
    });

    join_all(fetches).await
}
