//! Portfolio Personal Inversiones (PPI) broker client.
//!
//! PPI authenticates with an API key/secret pair exchanged for a short
//! lived bearer token. The client logs in lazily and re-logs once when the
//! token is rejected.

use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::models::{AssetCategory, Currency, PortfolioAsset, Provider};

use super::{decimal_from_f64, PortfolioProvider, ProviderError};

const PPI_API_BASE: &str = "https://clientapi.portfoliopersonal.com";

pub struct PpiClient {
    client: Client,
    base_url: String,
    api_key: SecretString,
    api_secret: SecretString,
    account_number: String,
    token: Mutex<Option<SecretString>>,
}

#[derive(Debug, Deserialize)]
struct PpiLoginResponse {
    #[serde(rename = "accessToken")]
    access_token: String,
}

/// `GET /api/v1/account/balances-and-positions` response.
#[derive(Debug, Deserialize)]
struct PpiBalancesResponse {
    #[serde(rename = "groupedAvailability", default)]
    grouped_availability: Vec<PpiAvailabilityGroup>,
}

#[derive(Debug, Deserialize)]
struct PpiAvailabilityGroup {
    /// Settlement currency label, e.g. "PESOS" or "DOLARES".
    #[serde(default)]
    name: String,
    #[serde(default)]
    availability: Vec<PpiPosition>,
}

#[derive(Debug, Deserialize)]
struct PpiPosition {
    #[serde(default)]
    ticker: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(rename = "instrumentType", default)]
    instrument_type: String,
    #[serde(default)]
    amount: f64,
    #[serde(default)]
    price: f64,
    #[serde(rename = "averagePrice", default)]
    average_price: f64,
    /// Per-position currency override; the group label applies otherwise.
    #[serde(default)]
    currency: Option<String>,
}

impl PpiClient {
    pub fn new(
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
        account_number: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url: PPI_API_BASE.to_string(),
            api_key: SecretString::from(api_key.into()),
            api_secret: SecretString::from(api_secret.into()),
            account_number: account_number.into(),
            token: Mutex::new(None),
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

    fn http_error(e: reqwest::Error) -> ProviderError {
        ProviderError::Http {
            provider: Provider::Ppi,
            source: e,
        }
    }

    async fn login(&self) -> Result<SecretString, ProviderError> {
        let response = self
            .client
            .post(format!("{}/api/v1/account/login-api", self.base_url))
            .header("ApiKey", self.api_key.expose_secret())
            .header("ApiSecret", self.api_secret.expose_secret())
            .send()
            .await
            .map_err(Self::http_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(
                Provider::Ppi,
                status.as_u16(),
                body,
            ));
        }

        let login: PpiLoginResponse =
            response
                .json()
                .await
                .map_err(|e| ProviderError::InvalidResponse {
                    provider: Provider::Ppi,
                    detail: e.to_string(),
                })?;

        info!("ppi session established");
        Ok(SecretString::from(login.access_token))
    }

    async fn ensure_token(&self) -> Result<String, ProviderError> {
        let mut guard = self.token.lock().await;
        if let Some(token) = guard.as_ref() {
            return Ok(token.expose_secret().to_string());
        }
        let token = self.login().await?;
        let exposed = token.expose_secret().to_string();
        *guard = Some(token);
        Ok(exposed)
    }

    async fn balances_request(&self, token: &str) -> Result<reqwest::Response, ProviderError> {
        self.client
            .get(format!(
                "{}/api/v1/account/balances-and-positions",
                self.base_url
            ))
            .query(&[("accountNumber", self.account_number.as_str())])
            .bearer_auth(token)
            .send()
            .await
            .map_err(Self::http_error)
    }

    async fn get_balances_and_positions(&self) -> Result<PpiBalancesResponse, ProviderError> {
        let token = self.ensure_token().await?;
        let mut response = self.balances_request(&token).await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            // Stale token; drop it and log in again once.
            {
                let mut guard = self.token.lock().await;
                *guard = None;
            }
            let token = self.ensure_token().await?;
            response = self.balances_request(&token).await?;
        }

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(
                Provider::Ppi,
                status.as_u16(),
                body,
            ));
        }

        response
            .json::<PpiBalancesResponse>()
            .await
            .map_err(|e| ProviderError::InvalidResponse {
                provider: Provider::Ppi,
                detail: e.to_string(),
            })
    }
}

/// PPI instrument types, matched by substring. Fixed income and funds
/// collapse into the stock bucket; availability rows are cash.
fn map_instrument_type(instrument_type: &str) -> AssetCategory {
    let value = instrument_type.to_lowercase();
    if value.contains("cedear") {
        AssetCategory::Cedear
    } else if value.contains("disponibilidad") || value.contains("cash") || value.contains("saldo")
    {
        AssetCategory::Cash
    } else if value.contains("accion")
        || value.contains("bono")
        || value.contains("letra")
        || value.contains("obligacion")
        || value.contains("fondo")
    {
        AssetCategory::Stock
    } else {
        AssetCategory::Stock
    }
}

fn map_currency(label: &str) -> Currency {
    let label = label.to_lowercase();
    if label.contains("dolar") || label.contains("dollar") || label.contains("u$s") {
        Currency::Usd
    } else {
        Currency::Ars
    }
}

fn map_position(group: &PpiAvailabilityGroup, position: &PpiPosition) -> Option<PortfolioAsset> {
    let ticker = position.ticker.trim().to_uppercase();
    if ticker.is_empty() || position.amount <= 0.0 {
        return None;
    }

    let currency = position
        .currency
        .as_deref()
        .map(map_currency)
        .unwrap_or_else(|| map_currency(&group.name));

    let mut category = map_instrument_type(&position.instrument_type);
    if ticker == "ARS" || ticker == "USD" {
        category = AssetCategory::Cash;
    }

    let (average_price, price) = if category == AssetCategory::Cash {
        (Decimal::ZERO, Decimal::ONE)
    } else {
        (
            decimal_from_f64(position.average_price),
            decimal_from_f64(position.price),
        )
    };

    let mut asset = PortfolioAsset::new(
        Provider::Ppi,
        ticker,
        category,
        currency,
        decimal_from_f64(position.amount),
        average_price,
        price,
    );

    if let Some(description) = position.description.as_deref() {
        let description = description.trim();
        if !description.is_empty() {
            asset = asset.with_name(description);
        }
    }

    Some(asset)
}

#[async_trait::async_trait]
impl PortfolioProvider for PpiClient {
    fn provider(&self) -> Provider {
        Provider::Ppi
    }

    async fn fetch_positions(&self) -> Result<Vec<PortfolioAsset>, ProviderError> {
        let response = self.get_balances_and_positions().await?;

        let positions: Vec<PortfolioAsset> = response
            .grouped_availability
            .iter()
            .flat_map(|group| {
                group
                    .availability
                    .iter()
                    .filter_map(move |position| map_position(group, position))
            })
            .collect();

        debug!(positions = positions.len(), "ppi positions mapped");
        Ok(positions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    const SAMPLE_BALANCES: &str = r#"{
        "groupedAvailability": [
            {
                "name": "PESOS",
                "availability": [
                    {
                        "ticker": "GGAL",
                        "description": "Grupo Financiero Galicia",
                        "instrumentType": "ACCIONES",
                        "amount": 50.0,
                        "price": 4600.0,
                        "averagePrice": 4000.0
                    },
                    {
                        "ticker": "ARS",
                        "description": "Disponible en pesos",
                        "instrumentType": "Disponibilidades",
                        "amount": 25000.0,
                        "price": 1.0,
                        "averagePrice": 0.0
                    }
                ]
            },
            {
                "name": "DOLARES",
                "availability": [
                    {
                        "ticker": "KO",
                        "description": "Coca-Cola CEDEAR",
                        "instrumentType": "CEDEARS",
                        "amount": 30.0,
                        "price": 12.5,
                        "averagePrice": 10.0,
                        "currency": "Dolares"
                    },
                    {
                        "ticker": "",
                        "instrumentType": "ACCIONES",
                        "amount": 10.0,
                        "price": 5.0,
                        "averagePrice": 1.0
                    }
                ]
            }
        ]
    }"#;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn mapped() -> Vec<PortfolioAsset> {
        let response: PpiBalancesResponse = serde_json::from_str(SAMPLE_BALANCES).unwrap();
        response
            .grouped_availability
            .iter()
            .flat_map(|g| {
                g.availability
                    .iter()
                    .filter_map(move |p| map_position(g, p))
            })
            .collect()
    }

    #[test]
    fn parses_and_maps_sample_balances() {
        let positions = mapped();

        // The empty-ticker row is filtered out.
        assert_eq!(positions.len(), 3);

        let ggal = &positions[0];
        assert_eq!(ggal.id, "ppi-GGAL");
        assert_eq!(ggal.currency, Currency::Ars);
        assert_eq!(ggal.current_value, dec("230000"));
        assert_eq!(ggal.pnl, dec("30000"));

        let cash = &positions[1];
        assert_eq!(cash.category, AssetCategory::Cash);
        assert_eq!(cash.current_price, Decimal::ONE);
        assert_eq!(cash.pnl, Decimal::ZERO);

        let ko = &positions[2];
        assert_eq!(ko.category, AssetCategory::Cedear);
        assert_eq!(ko.currency, Currency::Usd);
    }

    #[test]
    fn group_currency_applies_when_position_has_none() {
        let positions = mapped();
        // GGAL has no per-position currency; the PESOS group label applies.
        assert_eq!(positions[0].currency, Currency::Ars);
    }

    #[test]
    fn instrument_type_table() {
        assert_eq!(map_instrument_type("ACCIONES"), AssetCategory::Stock);
        assert_eq!(map_instrument_type("CEDEARS"), AssetCategory::Cedear);
        assert_eq!(map_instrument_type("Disponibilidades"), AssetCategory::Cash);
        // Bonds and funds collapse into the stock bucket.
        assert_eq!(map_instrument_type("BONOS"), AssetCategory::Stock);
        assert_eq!(map_instrument_type("Letras"), AssetCategory::Stock);
        assert_eq!(map_instrument_type("FCI - Fondo"), AssetCategory::Stock);
        assert_eq!(map_instrument_type("desconocido"), AssetCategory::Stock);
    }

    #[test]
    fn currency_table() {
        assert_eq!(map_currency("PESOS"), Currency::Ars);
        assert_eq!(map_currency("DOLARES"), Currency::Usd);
        assert_eq!(map_currency("Dolar Billete"), Currency::Usd);
        assert_eq!(map_currency("U$S MEP"), Currency::Usd);
        assert_eq!(map_currency("otro"), Currency::Ars);
    }
}
