// src/portfolio/models.rs
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::fx::ExchangeRate;
use crate::models::{Currency, GroupAllocation, PortfolioAsset, ProviderStatus};

/// P&L window for the aggregate summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    Day,
    #[default]
    Total,
}

#[derive(Debug, Clone)]
pub struct AggregateRequest {
    pub display_currency: Currency,
    pub period: Period,
}

impl AggregateRequest {
    pub fn new(display_currency: Currency) -> Self {
        Self {
            display_currency,
            period: Period::default(),
        }
    }

    pub fn with_period(mut self, period: Period) -> Self {
        self.period = period;
        self
    }
}

/// The merged multi-provider portfolio, allocation populated, monetary
/// `display_*` fields in the requested currency.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedPortfolio {
    pub display_currency: Currency,
    /// Σ display value over the merged set.
    pub total_value: Decimal,
    pub assets: Vec<PortfolioAsset>,
    /// Per-provider connection state; a disconnected provider contributed
    /// an empty list, not an error.
    pub providers: Vec<ProviderStatus>,
    pub exchange_rate: ExchangeRate,
    pub summary: PortfolioSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioSummary {
    pub period: Period,
    pub pnl: Decimal,
    pub pnl_percent: Decimal,
}

/// Risk groupings over one aggregated portfolio.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskGroups {
    pub by_sector: Vec<GroupAllocation>,
    pub by_country: Vec<GroupAllocation>,
    pub by_correlation_group: Vec<GroupAllocation>,
}
