use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Allocation of a sector, country, or correlation-cluster bucket.
///
/// Groups are recomputed from scratch on every request; `tickers` keeps the
/// order in which members were first encountered.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupAllocation {
    pub name: String,
    pub tickers: Vec<String>,
    pub total_value: Decimal,
    /// Percent of total portfolio value, rounded to 2 decimal places.
    pub allocation: Decimal,
    /// Strictly above the 30% concentration threshold.
    pub is_concentrated: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_camel_case() {
        let group = GroupAllocation {
            name: "US Banks".to_string(),
            tickers: vec!["JPM".to_string(), "BAC".to_string()],
            total_value: Decimal::from(100),
            allocation: Decimal::from(100),
            is_concentrated: true,
        };

        let json = serde_json::to_value(&group).unwrap();
        assert_eq!(json["totalValue"], serde_json::json!(100.0));
        assert_eq!(json["isConcentrated"], serde_json::json!(true));
    }
}
