// src/portfolio/allocation.rs
use rust_decimal::{Decimal, RoundingStrategy};

use crate::fx::convert;
use crate::models::{Currency, PortfolioAsset};

/// Project a position's monetary fields into the display currency. The
/// original-currency fields stay untouched for audit and display toggling.
pub fn project_display(asset: &mut PortfolioAsset, display_currency: Currency, rate: Decimal) {
    asset.display_price = Some(convert(
        asset.current_price,
        asset.currency,
        display_currency,
        rate,
    ));
    asset.display_avg_price = Some(convert(
        asset.average_price,
        asset.currency,
        display_currency,
        rate,
    ));
    asset.display_value = Some(convert(
        asset.current_value,
        asset.currency,
        display_currency,
        rate,
    ));
    asset.display_pnl = Some(convert(asset.pnl, asset.currency, display_currency, rate));
}

/// Populate `allocation` over the merged set and return the total display
/// value. A zero-value portfolio gets all-zero allocations, never NaN.
pub fn compute_allocations(assets: &mut [PortfolioAsset]) -> Decimal {
    let total: Decimal = assets
        .iter()
        .map(|a| a.display_value.unwrap_or(a.current_value))
        .sum();

    for asset in assets.iter_mut() {
        let value = asset.display_value.unwrap_or(asset.current_value);
        asset.allocation = if total > Decimal::ZERO {
            (value / total * Decimal::from(100))
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
        } else {
            Decimal::ZERO
        };
    }

    total
}

/// Concatenate provider lists in order, convert to the display currency,
/// and populate allocations. This is the pure core of the aggregator:
/// everything except I/O and the quote overlay.
pub fn aggregate_positions(
    provider_lists: Vec<Vec<PortfolioAsset>>,
    display_currency: Currency,
    rate: Decimal,
) -> (Vec<PortfolioAsset>, Decimal) {
    let mut merged: Vec<PortfolioAsset> = provider_lists.into_iter().flatten().collect();

    for asset in merged.iter_mut() {
        project_display(asset, display_currency, rate);
    }

    let total = compute_allocations(&mut merged);
    (merged, total)
}
