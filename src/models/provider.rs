use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Iol,
    Ppi,
    Binance,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Iol => "iol",
            Provider::Ppi => "ppi",
            Provider::Binance => "binance",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-provider outcome of an aggregation request. A failed provider is
/// reported here instead of failing the whole aggregation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderStatus {
    pub provider: Provider,
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProviderStatus {
    pub fn connected(provider: Provider) -> Self {
        Self {
            provider,
            connected: true,
            error: None,
        }
    }

    pub fn failed(provider: Provider, error: impl Into<String>) -> Self {
        Self {
            provider,
            connected: false,
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&Provider::Binance).unwrap(),
            r#""binance""#
        );
        assert_eq!(serde_json::to_string(&Provider::Iol).unwrap(), r#""iol""#);
    }

    #[test]
    fn failed_status_carries_error() {
        let status = ProviderStatus::failed(Provider::Ppi, "token expired");
        assert!(!status.connected);
        assert_eq!(status.error.as_deref(), Some("token expired"));

        let json = serde_json::to_value(ProviderStatus::connected(Provider::Iol)).unwrap();
        assert!(json.get("error").is_none());
    }
}
