// src/portfolio/groups.rs
use rust_decimal::{Decimal, RoundingStrategy};

use crate::metadata::ticker_meta;
use crate::models::{GroupAllocation, PortfolioAsset};

use super::RiskGroups;

/// Concentration flag threshold, strictly exceeded: 30.00% is fine,
/// 30.01% is flagged.
fn concentration_threshold() -> Decimal {
    Decimal::from(30)
}

/// Accumulates members per group key, preserving first-encounter order.
#[derive(Default)]
struct GroupAccumulator {
    groups: Vec<(String, Vec<String>, Decimal)>,
}

impl GroupAccumulator {
    fn add(&mut self, key: &str, ticker: &str, value: Decimal) {
        match self.groups.iter_mut().find(|(name, _, _)| name == key) {
            Some((_, tickers, total)) => {
                tickers.push(ticker.to_string());
                *total += value;
            }
            None => self
                .groups
                .push((key.to_string(), vec![ticker.to_string()], value)),
        }
    }

    fn finish(self, portfolio_total: Decimal) -> Vec<GroupAllocation> {
        let mut allocations: Vec<GroupAllocation> = self
            .groups
            .into_iter()
            .map(|(name, tickers, total_value)| {
                let allocation = (total_value / portfolio_total * Decimal::from(100))
                    .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
                GroupAllocation {
                    name,
                    tickers,
                    total_value,
                    is_concentrated: allocation > concentration_threshold(),
                    allocation,
                }
            })
            .collect();

        // Stable sort: equal allocations keep encounter order.
        allocations.sort_by(|a, b| b.allocation.cmp(&a.allocation));
        allocations
    }
}

/// Bucket the portfolio by sector, country, and correlation cluster.
///
/// Each position lands in exactly one group per dimension, from the static
/// ticker metadata table. Groups are rebuilt from scratch per call; a
/// zero-value portfolio yields three empty lists.
pub fn group_portfolio(assets: &[PortfolioAsset]) -> RiskGroups {
    let total: Decimal = assets
        .iter()
        .map(|a| a.display_value.unwrap_or(a.current_value))
        .sum();

    if total <= Decimal::ZERO {
        return RiskGroups::default();
    }

    let mut by_sector = GroupAccumulator::default();
    let mut by_country = GroupAccumulator::default();
    let mut by_correlation = GroupAccumulator::default();

    for asset in assets {
        let value = asset.display_value.unwrap_or(asset.current_value);
        let meta = ticker_meta(&asset.ticker);
        by_sector.add(meta.sector, &asset.ticker, value);
        by_country.add(meta.country, &asset.ticker, value);
        by_correlation.add(meta.correlation_group, &asset.ticker, value);
    }

    RiskGroups {
        by_sector: by_sector.finish(total),
        by_country: by_country.finish(total),
        by_correlation_group: by_correlation.finish(total),
    }
}
