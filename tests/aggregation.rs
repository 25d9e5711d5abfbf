//! End-to-end aggregation over wiremock-backed broker clients.

use std::sync::Arc;

use anyhow::Result;
use cartera::clock::{Clock, FixedClock};
use cartera::models::{Currency, Provider};
use cartera::portfolio::{group_portfolio, AggregateRequest, PortfolioService};
use cartera::providers::{BinanceClient, IolClient, PortfolioProvider, PpiClient};
use cartera::fx::ExchangeRateService;
use cartera::retry::RetryPolicy;
use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use std::str::FromStr;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const IOL_PORTFOLIO: &str = r#"{
    "activos": [
        {
            "cantidad": 1.0,
            "ultimoPrecio": 700.0,
            "ppc": 0.0,
            "titulo": {"simbolo": "GGAL", "tipo": "ACCIONES", "moneda": "peso_Argentino"}
        }
    ]
}"#;

const IOL_ESTADO_CUENTA: &str = r#"{"cuentas": []}"#;

const BINANCE_ACCOUNT: &str = r#"{
    "balances": [
        {"asset": "BTC", "free": "1.00000000", "locked": "0.00000000"}
    ]
}"#;

const BINANCE_TICKERS: &str = r#"[{"symbol": "BTCUSDT", "price": "300.00000000"}]"#;

async fn mount_iol(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/v2/portafolio/argentina"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(IOL_PORTFOLIO, "application/json"))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v2/estadocuenta"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(IOL_ESTADO_CUENTA, "application/json"),
        )
        .mount(server)
        .await;
}

async fn mount_binance(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/v3/account"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(BINANCE_ACCOUNT, "application/json"))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v3/ticker/price"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(BINANCE_TICKERS, "application/json"))
        .mount(server)
        .await;
}

fn fixed_clock() -> Arc<dyn Clock> {
    Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap(),
    ))
}

#[tokio::test]
async fn degraded_aggregation_reports_partial_portfolio() -> Result<()> {
    let iol_server = MockServer::start().await;
    let ppi_server = MockServer::start().await;
    let binance_server = MockServer::start().await;

    mount_iol(&iol_server).await;
    mount_binance(&binance_server).await;

    // PPI rejects the login outright: expired credentials.
    Mock::given(method("POST"))
        .and(path("/api/v1/account/login-api"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&ppi_server)
        .await;

    let providers: Vec<Arc<dyn PortfolioProvider>> = vec![
        Arc::new(IolClient::new("token").with_base_url(iol_server.uri())),
        Arc::new(PpiClient::new("key", "secret", "12345").with_base_url(ppi_server.uri())),
        Arc::new(
            BinanceClient::new("key", "secret")
                .with_base_url(binance_server.uri())
                .with_clock(fixed_clock()),
        ),
    ];

    let service = PortfolioService::new(providers, ExchangeRateService::offline())
        .with_retry_policy(RetryPolicy::none());

    let portfolio = service
        .aggregate(&AggregateRequest::new(Currency::Usd))
        .await?;

    // Statuses keep provider order; only PPI is down.
    assert_eq!(portfolio.providers.len(), 3);
    assert_eq!(portfolio.providers[0].provider, Provider::Iol);
    assert!(portfolio.providers[0].connected);
    assert_eq!(portfolio.providers[1].provider, Provider::Ppi);
    assert!(!portfolio.providers[1].connected);
    assert!(portfolio.providers[2].connected);

    // GGAL (700 ARS -> 0.7 USD at the fallback rate) plus BTC (300 USD).
    assert_eq!(portfolio.assets.len(), 2);
    assert_eq!(portfolio.total_value, Decimal::from_str("300.7")?);
    assert_eq!(portfolio.assets[0].allocation, Decimal::from_str("0.23")?);
    assert_eq!(portfolio.assets[1].allocation, Decimal::from_str("99.77")?);

    let allocation_sum: Decimal = portfolio.assets.iter().map(|a| a.allocation).sum();
    assert!((allocation_sum - Decimal::from(100)).abs() <= Decimal::from_str("0.05")?);

    Ok(())
}

#[tokio::test]
async fn grouping_runs_over_the_aggregated_display_values() -> Result<()> {
    let iol_server = MockServer::start().await;
    let binance_server = MockServer::start().await;
    mount_iol(&iol_server).await;
    mount_binance(&binance_server).await;

    let providers: Vec<Arc<dyn PortfolioProvider>> = vec![
        Arc::new(IolClient::new("token").with_base_url(iol_server.uri())),
        Arc::new(
            BinanceClient::new("key", "secret")
                .with_base_url(binance_server.uri())
                .with_clock(fixed_clock()),
        ),
    ];

    let service = PortfolioService::new(providers, ExchangeRateService::offline())
        .with_retry_policy(RetryPolicy::none());

    let portfolio = service
        .aggregate(&AggregateRequest::new(Currency::Usd))
        .await?;
    let groups = group_portfolio(&portfolio.assets);

    // BTC dominates the 300.7 USD portfolio.
    let crypto = &groups.by_correlation_group[0];
    assert_eq!(crypto.name, "Crypto Majors");
    assert!(crypto.is_concentrated);

    let banks = groups
        .by_correlation_group
        .iter()
        .find(|g| g.name == "Argentine Banks")
        .unwrap();
    assert_eq!(banks.tickers, vec!["GGAL"]);
    assert!(!banks.is_concentrated);

    Ok(())
}

#[tokio::test]
async fn all_providers_down_yields_empty_connected_nothing() -> Result<()> {
    let iol_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v2/portafolio/argentina"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&iol_server)
        .await;

    let providers: Vec<Arc<dyn PortfolioProvider>> =
        vec![Arc::new(IolClient::new("stale").with_base_url(iol_server.uri()))];

    let service = PortfolioService::new(providers, ExchangeRateService::offline())
        .with_retry_policy(RetryPolicy::none());

    let portfolio = service
        .aggregate(&AggregateRequest::new(Currency::Usd))
        .await?;

    assert!(portfolio.assets.is_empty());
    assert_eq!(portfolio.total_value, Decimal::ZERO);
    assert!(!portfolio.providers[0].connected);
    assert!(portfolio.providers[0]
        .error
        .as_deref()
        .unwrap()
        .contains("reconnect"));

    let groups = group_portfolio(&portfolio.assets);
    assert!(groups.by_sector.is_empty());

    Ok(())
}
