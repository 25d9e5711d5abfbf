//! InvertirOnline (IOL) broker client.
//!
//! Uses the v2 REST API with bearer-token auth. On a 401 the client
//! refreshes the session once through the token endpoint (when a refresh
//! token is available) and retries before surfacing `TokenExpired`.

use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::models::{AssetCategory, Currency, PortfolioAsset, Provider};

use super::{decimal_from_f64, PortfolioProvider, ProviderError};

const IOL_API_BASE: &str = "https://api.invertironline.com";

struct IolSession {
    access_token: SecretString,
    refresh_token: Option<SecretString>,
}

pub struct IolClient {
    client: Client,
    base_url: String,
    session: Mutex<IolSession>,
}

/// IOL token endpoint response.
#[derive(Debug, Deserialize)]
struct IolTokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[allow(dead_code)]
    #[serde(default)]
    expires_in: Option<u64>,
}

/// `GET /api/v2/portafolio/argentina` response.
#[derive(Debug, Deserialize)]
struct IolPortfolioResponse {
    #[allow(dead_code)]
    #[serde(default)]
    pais: Option<String>,
    #[serde(default)]
    activos: Vec<IolActivo>,
}

#[derive(Debug, Deserialize)]
struct IolActivo {
    cantidad: f64,
    #[serde(default)]
    comprometido: f64,
    #[serde(rename = "ultimoPrecio")]
    ultimo_precio: f64,
    /// Precio promedio de compra (cost basis per unit).
    #[serde(default)]
    ppc: f64,
    titulo: IolTitulo,
}

#[derive(Debug, Deserialize)]
struct IolTitulo {
    simbolo: String,
    #[serde(default)]
    descripcion: String,
    #[serde(default)]
    tipo: String,
    #[serde(default)]
    moneda: String,
}

/// `GET /api/v2/estadocuenta` response, trimmed to the cash balances.
#[derive(Debug, Deserialize)]
struct IolEstadoCuenta {
    #[serde(default)]
    cuentas: Vec<IolCuenta>,
}

#[derive(Debug, Deserialize)]
struct IolCuenta {
    #[serde(default)]
    moneda: String,
    #[serde(default)]
    disponible: f64,
}

impl IolClient {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: IOL_API_BASE.to_string(),
            session: Mutex::new(IolSession {
                access_token: SecretString::from(access_token.into()),
                refresh_token: None,
            }),
        }
    }

    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.session.get_mut().refresh_token = Some(SecretString::from(refresh_token.into()));
        self
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
            provider: Provider::Iol,
            source: e,
        }
    }

    async fn authorized_get(&self, path: &str) -> Result<reqwest::Response, ProviderError> {
        let token = {
            let session = self.session.lock().await;
            session.access_token.expose_secret().to_string()
        };

        self.client
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(token)
            .send()
            .await
            .map_err(Self::http_error)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ProviderError> {
        let mut response = self.authorized_get(path).await?;

        if response.status() == StatusCode::UNAUTHORIZED && self.refresh_session().await? {
            response = self.authorized_get(path).await?;
        }

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(
                Provider::Iol,
                status.as_u16(),
                body,
            ));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ProviderError::InvalidResponse {
                provider: Provider::Iol,
                detail: e.to_string(),
            })
    }

    /// Try to exchange the refresh token for a new session. Returns whether
    /// a retry is worthwhile.
    async fn refresh_session(&self) -> Result<bool, ProviderError> {
        let refresh_token = {
            let session = self.session.lock().await;
            session
                .refresh_token
                .as_ref()
                .map(|t| t.expose_secret().to_string())
        };

        let Some(refresh_token) = refresh_token else {
            return Ok(false);
        };

        let response = self
            .client
            .post(format!("{}/token", self.base_url))
            .form(&[
                ("refresh_token", refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(Self::http_error)?;

        if !response.status().is_success() {
            warn!(status = %response.status(), "iol token refresh rejected");
            return Ok(false);
        }

        let tokens: IolTokenResponse =
            response
                .json()
                .await
                .map_err(|e| ProviderError::InvalidResponse {
                    provider: Provider::Iol,
                    detail: e.to_string(),
                })?;

        let mut session = self.session.lock().await;
        session.access_token = SecretString::from(tokens.access_token);
        if let Some(refresh) = tokens.refresh_token {
            session.refresh_token = Some(SecretString::from(refresh));
        }
        info!("iol session refreshed");
        Ok(true)
    }
}

/// IOL instrument types, matched by substring since the API mixes casings.
/// Bonds, bills, notes and funds collapse into the stock bucket.
fn map_instrument_type(tipo: &str) -> AssetCategory {
    let tipo = tipo.to_lowercase();
    if tipo.contains("cedear") {
        AssetCategory::Cedear
    } else if tipo.contains("accion") {
        AssetCategory::Stock
    } else if tipo.contains("titulo")
        || tipo.contains("bono")
        || tipo.contains("letra")
        || tipo.contains("obligacion")
        || tipo.contains("fondo")
    {
        AssetCategory::Stock
    } else {
        AssetCategory::Stock
    }
}

fn map_currency(label: &str) -> Currency {
    let label = label.to_lowercase();
    if label.contains("dolar") || label.contains("dollar") || label.contains("usd") {
        Currency::Usd
    } else {
        Currency::Ars
    }
}

fn map_position(activo: &IolActivo) -> Option<PortfolioAsset> {
    let ticker = activo.titulo.simbolo.trim().to_uppercase();
    if ticker.is_empty() || activo.cantidad <= 0.0 {
        return None;
    }

    let mut asset = PortfolioAsset::new(
        Provider::Iol,
        ticker,
        map_instrument_type(&activo.titulo.tipo),
        map_currency(&activo.titulo.moneda),
        decimal_from_f64(activo.cantidad),
        decimal_from_f64(activo.ppc),
        decimal_from_f64(activo.ultimo_precio),
    )
    .with_locked(decimal_from_f64(activo.comprometido));

    let descripcion = activo.titulo.descripcion.trim();
    if !descripcion.is_empty() {
        asset = asset.with_name(descripcion);
    }

    Some(asset)
}

fn map_cash(cuenta: &IolCuenta) -> Option<PortfolioAsset> {
    if cuenta.disponible <= 0.0 {
        return None;
    }

    let currency = map_currency(&cuenta.moneda);
    let name = match currency {
        Currency::Ars => "Pesos",
        Currency::Usd => "Dólares",
    };

    Some(
        PortfolioAsset::new(
            Provider::Iol,
            currency.as_str(),
            AssetCategory::Cash,
            currency,
            decimal_from_f64(cuenta.disponible),
            Decimal::ZERO,
            Decimal::ONE,
        )
        .with_name(name),
    )
}

#[async_trait::async_trait]
impl PortfolioProvider for IolClient {
    fn provider(&self) -> Provider {
        Provider::Iol
    }

    async fn fetch_positions(&self) -> Result<Vec<PortfolioAsset>, ProviderError> {
        let portfolio: IolPortfolioResponse = self.get_json("/api/v2/portafolio/argentina").await?;

        let mut positions: Vec<PortfolioAsset> =
            portfolio.activos.iter().filter_map(map_position).collect();
        debug!(positions = positions.len(), "iol portfolio mapped");

        // Cash balances are additive; an expired token still fails, but a
        // flaky estadocuenta endpoint should not drop the positions.
        match self.get_json::<IolEstadoCuenta>("/api/v2/estadocuenta").await {
            Ok(estado) => positions.extend(estado.cuentas.iter().filter_map(map_cash)),
            Err(e) if e.is_auth() => return Err(e),
            Err(e) => warn!(error = %e, "iol cash balances unavailable"),
        }

        Ok(positions)
    }
}
