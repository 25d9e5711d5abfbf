// src/portfolio/aggregator.rs
use std::sync::Arc;

use anyhow::Result;
use rust_decimal::Decimal;
use tracing::info;

use crate::fx::ExchangeRateService;
use crate::models::{AssetCategory, PortfolioAsset, ProviderStatus};
use crate::providers::{fetch_all, PortfolioProvider};
use crate::quotes::{apply_quotes, QuoteService};
use crate::retry::RetryPolicy;

use super::{
    compute_allocations, project_display, AggregateRequest, AggregatedPortfolio, Period,
    PortfolioSummary,
};

/// Merges positions from every configured provider into one portfolio.
///
/// Provider fetches run concurrently and fail independently; the quote
/// overlay and currency conversion run over whatever arrived. The service
/// holds no per-request state.
pub struct PortfolioService {
    providers: Vec<Arc<dyn PortfolioProvider>>,
    quotes: Option<QuoteService>,
    rates: ExchangeRateService,
    retry: RetryPolicy,
}

impl PortfolioService {
    pub fn new(providers: Vec<Arc<dyn PortfolioProvider>>, rates: ExchangeRateService) -> Self {
        Self {
            providers,
            quotes: None,
            rates,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_quotes(mut self, quotes: QuoteService) -> Self {
        self.quotes = Some(quotes);
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub async fn aggregate(&self, request: &AggregateRequest) -> Result<AggregatedPortfolio> {
        let fetches = fetch_all(&self.providers, &self.retry).await;

        let mut statuses: Vec<ProviderStatus> = Vec::with_capacity(fetches.len());
        let mut merged: Vec<PortfolioAsset> = Vec::new();
        for fetch in fetches {
            statuses.push(fetch.status);
            merged.extend(fetch.assets);
        }

        if let Some(quotes) = &self.quotes {
            let requests = quote_requests(&merged);
            if !requests.is_empty() {
                let resolved = quotes.fetch_quotes(&requests).await;
                merged = apply_quotes(merged, &resolved);
            }
        }

        let rate = self.rates.current_rate().await;
        for asset in merged.iter_mut() {
            project_display(asset, request.display_currency, rate.rate);
        }

        let total_value = compute_allocations(&mut merged);
        let summary = summarize(&merged, total_value, request.period);

        info!(
            positions = merged.len(),
            connected = statuses.iter().filter(|s| s.connected).count(),
            providers = statuses.len(),
            total = %total_value,
            currency = %request.display_currency,
            "portfolio aggregated"
        );

        Ok(AggregatedPortfolio {
            display_currency: request.display_currency,
            total_value,
            assets: merged,
            providers: statuses,
            exchange_rate: rate,
            summary,
        })
    }
}

/// Unique quotable tickers in encounter order. Cash never gets a quote.
fn quote_requests(assets: &[PortfolioAsset]) -> Vec<(String, AssetCategory)> {
    let mut seen: Vec<&str> = Vec::new();
    let mut requests = Vec::new();

    for asset in assets {
        if !asset.category.is_quotable() {
            continue;
        }
        if seen.contains(&asset.ticker.as_str()) {
            continue;
        }
        seen.push(&asset.ticker);
        requests.push((asset.ticker.clone(), asset.category));
    }

    requests
}

/// Period P&L over the merged set. `Total` is cost-basis P&L; `Day` weights
/// the overlay's daily change by display value, skipping positions without
/// a quote.
fn summarize(assets: &[PortfolioAsset], total_value: Decimal, period: Period) -> PortfolioSummary {
    let hundred = Decimal::from(100);

    let (pnl, pnl_percent) = match period {
        Period::Total => {
            let pnl: Decimal = assets.iter().filter_map(|a| a.display_pnl).sum();
            let cost_basis = total_value - pnl;
            let percent = if cost_basis > Decimal::ZERO {
                (pnl / cost_basis * hundred).round_dp(2)
            } else {
                Decimal::ZERO
            };
            (pnl, percent)
        }
        Period::Day => {
            let pnl: Decimal = assets
                .iter()
                .filter_map(|a| {
                    let change = a.daily_change?;
                    let value = a.display_value.unwrap_or(a.current_value);
                    Some(value * change / hundred)
                })
                .sum();
            let percent = if total_value > Decimal::ZERO {
                (pnl / total_value * hundred).round_dp(2)
            } else {
                Decimal::ZERO
            };
            (pnl, percent)
        }
    };

    PortfolioSummary {
        period,
        pnl,
        pnl_percent,
    }
}

/// Convenience constructor for a service with no live quotes and the
/// fallback exchange rate only. Useful for offline rendering and tests.
pub fn offline_service(providers: Vec<Arc<dyn PortfolioProvider>>) -> PortfolioService {
    PortfolioService::new(providers, ExchangeRateService::offline())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Currency, Provider};
    use crate::providers::ProviderError;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    struct FixedProvider {
        provider: Provider,
        assets: Vec<PortfolioAsset>,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl PortfolioProvider for FixedProvider {
        fn provider(&self) -> Provider {
            self.provider
        }

        async fn fetch_positions(&self) -> Result<Vec<PortfolioAsset>, ProviderError> {
            if self.fail {
                return Err(ProviderError::TokenExpired {
                    provider: self.provider,
                });
            }
            Ok(self.assets.clone())
        }
    }

    fn position(
        provider: Provider,
        ticker: &str,
        category: AssetCategory,
        currency: Currency,
        value: &str,
    ) -> PortfolioAsset {
        PortfolioAsset::new(
            provider,
            ticker,
            category,
            currency,
            Decimal::ONE,
            Decimal::ZERO,
            dec(value),
        )
    }

    #[tokio::test]
    async fn aggregates_partial_results_when_a_provider_fails() {
        let providers: Vec<Arc<dyn PortfolioProvider>> = vec![
            Arc::new(FixedProvider {
                provider: Provider::Iol,
                assets: vec![position(
                    Provider::Iol,
                    "GGAL",
                    AssetCategory::Stock,
                    Currency::Ars,
                    "700",
                )],
                fail: false,
            }),
            Arc::new(FixedProvider {
                provider: Provider::Ppi,
                assets: vec![],
                fail: true,
            }),
            Arc::new(FixedProvider {
                provider: Provider::Binance,
                assets: vec![position(
                    Provider::Binance,
                    "BTC",
                    AssetCategory::Crypto,
                    Currency::Usd,
                    "300",
                )],
                fail: false,
            }),
        ];

        let service =
            offline_service(providers).with_retry_policy(RetryPolicy::none());
        let portfolio = service
            .aggregate(&AggregateRequest::new(Currency::Usd))
            .await
            .unwrap();

        assert_eq!(portfolio.assets.len(), 2);
        assert_eq!(portfolio.providers.len(), 3);
        assert!(portfolio.providers[0].connected);
        assert!(!portfolio.providers[1].connected);
        assert!(portfolio.providers[2].connected);

        // GGAL: 700 ARS -> 0.7 USD at the fallback rate of 1000.
        assert_eq!(portfolio.assets[0].display_value, Some(dec("0.7")));
        assert_eq!(portfolio.total_value, dec("300.7"));
        assert_eq!(portfolio.assets[0].allocation, dec("0.23"));
        assert_eq!(portfolio.assets[1].allocation, dec("99.77"));
    }

    #[tokio::test]
    async fn empty_portfolio_aggregates_to_zero() {
        let providers: Vec<Arc<dyn PortfolioProvider>> = vec![Arc::new(FixedProvider {
            provider: Provider::Iol,
            assets: vec![],
            fail: false,
        })];

        let service = offline_service(providers);
        let portfolio = service
            .aggregate(&AggregateRequest::new(Currency::Ars))
            .await
            .unwrap();

        assert!(portfolio.assets.is_empty());
        assert_eq!(portfolio.total_value, Decimal::ZERO);
        assert_eq!(portfolio.summary.pnl, Decimal::ZERO);
    }

    #[test]
    fn quote_requests_dedup_and_skip_cash() {
        let assets = vec![
            position(
                Provider::Iol,
                "GGAL",
                AssetCategory::Stock,
                Currency::Ars,
                "1",
            ),
            position(Provider::Iol, "ARS", AssetCategory::Cash, Currency::Ars, "1"),
            position(
                Provider::Ppi,
                "GGAL",
                AssetCategory::Stock,
                Currency::Ars,
                "1",
            ),
            position(
                Provider::Binance,
                "BTC",
                AssetCategory::Crypto,
                Currency::Usd,
                "1",
            ),
        ];

        let requests = quote_requests(&assets);
        let tickers: Vec<&str> = requests.iter().map(|(t, _)| t.as_str()).collect();
        assert_eq!(tickers, vec!["GGAL", "BTC"]);
    }

    #[test]
    fn total_summary_uses_cost_basis() {
        let mut asset = PortfolioAsset::new(
            Provider::Iol,
            "GGAL",
            AssetCategory::Stock,
            Currency::Usd,
            dec("10"),
            dec("10"),
            dec("12"),
        );
        project_display(&mut asset, Currency::Usd, dec("1000"));
        let assets = vec![asset];

        // Value 120, cost basis 100, pnl 20 => 20%.
        let summary = summarize(&assets, dec("120"), Period::Total);
        assert_eq!(summary.pnl, dec("20"));
        assert_eq!(summary.pnl_percent, dec("20.00"));
    }

    #[test]
    fn day_summary_weights_daily_change_by_value() {
        let mut with_quote = position(
            Provider::Iol,
            "GGAL",
            AssetCategory::Stock,
            Currency::Usd,
            "100",
        );
        with_quote.daily_change = Some(dec("2"));
        with_quote.display_value = Some(dec("100"));

        let mut without_quote = position(
            Provider::Iol,
            "YPF",
            AssetCategory::Stock,
            Currency::Usd,
            "100",
        );
        without_quote.display_value = Some(dec("100"));

        let summary = summarize(&[with_quote, without_quote], dec("200"), Period::Day);
        // 100 * 2% = 2 over a 200 total => 1%.
        assert_eq!(summary.pnl, dec("2"));
        assert_eq!(summary.pnl_percent, dec("1.00"));
    }
}
