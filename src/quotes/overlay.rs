use std::collections::HashMap;

use crate::models::PortfolioAsset;

use super::Quote;

/// Merge live quotes into held positions.
///
/// Quotes are matched by ticker, never by fetch-completion order, so the
/// input ordering is preserved. A position with a matching quote gets its
/// price replaced and its value and P&L recomputed; one without keeps the
/// provider-reported price and a `null` daily change.
pub fn apply_quotes(
    assets: Vec<PortfolioAsset>,
    quotes: &HashMap<String, Quote>,
) -> Vec<PortfolioAsset> {
    assets
        .into_iter()
        .map(|mut asset| {
            if let Some(quote) = quotes.get(&asset.ticker) {
                asset.reprice(quote.price);
                asset.daily_change = Some(quote.change_percent);
            }
            asset
        })
        .collect()
}
