use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::Provider;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Usd,
    Ars,
}

impl Currency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Ars => "ARS",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetCategory {
    Stock,
    Cedear,
    Crypto,
    Cash,
}

impl AssetCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetCategory::Stock => "stock",
            AssetCategory::Cedear => "cedear",
            AssetCategory::Crypto => "crypto",
            AssetCategory::Cash => "cash",
        }
    }

    /// Categories that can have a live market quote attached.
    pub fn is_quotable(&self) -> bool {
        !matches!(self, AssetCategory::Cash)
    }
}

impl fmt::Display for AssetCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical position record shared by every provider.
///
/// Instances are built fresh on every aggregation request. The
/// original-currency fields are what the provider reported (after mapping);
/// the `display_*` fields are projections into the requested display
/// currency, populated by the aggregator and left `None` before that step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioAsset {
    /// Unique per (provider, ticker), e.g. `"binance-BTC"`.
    pub id: String,
    pub ticker: String,
    pub name: String,
    pub category: AssetCategory,
    pub currency: Currency,
    pub quantity: Decimal,
    /// Cost basis per unit; zero when the provider does not report one.
    pub average_price: Decimal,
    pub current_price: Decimal,
    pub current_value: Decimal,
    pub pnl: Decimal,
    pub pnl_percent: Decimal,
    /// Share of total merged portfolio value; populated after the merge.
    #[serde(default)]
    pub allocation: Decimal,
    /// Percent change on the day, from the quote overlay. Stays `null` for
    /// positions without a matching live quote.
    pub daily_change: Option<Decimal>,
    /// Units reserved in open orders, where the provider reports holds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_avg_price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_value: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_pnl: Option<Decimal>,
}

impl PortfolioAsset {
    pub fn new(
        provider: Provider,
        ticker: impl Into<String>,
        category: AssetCategory,
        currency: Currency,
        quantity: Decimal,
        average_price: Decimal,
        current_price: Decimal,
    ) -> Self {
        let ticker = ticker.into();
        let (pnl, pnl_percent) = derive_pnl(average_price, current_price, quantity);
        Self {
            id: format!("{}-{}", provider.as_str(), ticker),
            name: ticker.clone(),
            ticker,
            category,
            currency,
            quantity,
            average_price,
            current_price,
            current_value: quantity * current_price,
            pnl,
            pnl_percent,
            allocation: Decimal::ZERO,
            daily_change: None,
            locked: None,
            display_price: None,
            display_avg_price: None,
            display_value: None,
            display_pnl: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_locked(mut self, locked: Decimal) -> Self {
        self.locked = if locked > Decimal::ZERO {
            Some(locked)
        } else {
            None
        };
        self
    }

    /// Whether the provider reported a real cost basis. A zero
    /// `average_price` means "unknown", not "free"; P&L stays zero.
    pub fn has_cost_basis(&self) -> bool {
        self.average_price > Decimal::ZERO
    }

    /// Replace the current price with a fresher one and recompute the
    /// derived fields. `current_value` is never trusted from upstream once
    /// a newer price exists.
    pub fn reprice(&mut self, price: Decimal) {
        self.current_price = price;
        self.current_value = self.quantity * price;
        let (pnl, pnl_percent) = derive_pnl(self.average_price, price, self.quantity);
        self.pnl = pnl;
        self.pnl_percent = pnl_percent;
    }
}

/// P&L against cost basis. Zero (never NaN) when no cost basis is known.
pub(crate) fn derive_pnl(
    average_price: Decimal,
    current_price: Decimal,
    quantity: Decimal,
) -> (Decimal, Decimal) {
    if average_price <= Decimal::ZERO {
        return (Decimal::ZERO, Decimal::ZERO);
    }
    let pnl = (current_price - average_price) * quantity;
    let pnl_percent =
        ((current_price - average_price) / average_price * Decimal::from(100)).round_dp(2);
    (pnl, pnl_percent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn new_derives_value_and_pnl() {
        let asset = PortfolioAsset::new(
            Provider::Iol,
            "GGAL",
            AssetCategory::Stock,
            Currency::Ars,
            dec("10"),
            dec("100"),
            dec("150"),
        );

        assert_eq!(asset.id, "iol-GGAL");
        assert_eq!(asset.current_value, dec("1500"));
        assert_eq!(asset.pnl, dec("500"));
        assert_eq!(asset.pnl_percent, dec("50.00"));
        assert!(asset.has_cost_basis());
    }

    #[test]
    fn zero_cost_basis_yields_zero_pnl() {
        let asset = PortfolioAsset::new(
            Provider::Binance,
            "BTC",
            AssetCategory::Crypto,
            Currency::Usd,
            dec("0.5"),
            Decimal::ZERO,
            dec("40000"),
        );

        assert_eq!(asset.pnl, Decimal::ZERO);
        assert_eq!(asset.pnl_percent, Decimal::ZERO);
        assert!(!asset.has_cost_basis());
    }

    #[test]
    fn reprice_recomputes_derived_fields() {
        let mut asset = PortfolioAsset::new(
            Provider::Iol,
            "GGAL",
            AssetCategory::Stock,
            Currency::Ars,
            dec("10"),
            dec("100"),
            dec("150"),
        );

        asset.reprice(dec("200"));
        assert_eq!(asset.current_value, dec("2000"));
        assert_eq!(asset.pnl, dec("1000"));
        assert_eq!(asset.pnl_percent, dec("100.00"));
    }

    #[test]
    fn with_locked_drops_zero_holds() {
        let asset = PortfolioAsset::new(
            Provider::Binance,
            "ETH",
            AssetCategory::Crypto,
            Currency::Usd,
            dec("2"),
            Decimal::ZERO,
            dec("2500"),
        )
        .with_locked(Decimal::ZERO);
        assert!(asset.locked.is_none());

        let asset = asset.with_locked(dec("0.5"));
        assert_eq!(asset.locked, Some(dec("0.5")));
    }

    #[test]
    fn serializes_camel_case_with_null_daily_change() {
        let asset = PortfolioAsset::new(
            Provider::Ppi,
            "AL30",
            AssetCategory::Stock,
            Currency::Ars,
            dec("100"),
            dec("50"),
            dec("60"),
        );

        let json = serde_json::to_value(&asset).unwrap();
        assert_eq!(json["id"], "ppi-AL30");
        assert_eq!(json["averagePrice"], serde_json::json!(50.0));
        assert!(json["dailyChange"].is_null());
        assert!(json.get("displayValue").is_none());
    }

    #[test]
    fn currency_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&Currency::Usd).unwrap(), r#""USD""#);
        assert_eq!(serde_json::to_string(&Currency::Ars).unwrap(), r#""ARS""#);
    }
}
