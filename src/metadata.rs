//! Static per-ticker reference data for risk grouping.
//!
//! This is deliberately a compiled-in table: the set of tickers the
//! dashboard cares about is small and slow-moving, and grouping must work
//! offline. Unrecognized tickers land in the "Unknown" buckets rather than
//! erroring.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickerMeta {
    pub sector: &'static str,
    pub country: &'static str,
    pub correlation_group: &'static str,
}

const UNKNOWN: TickerMeta = TickerMeta {
    sector: "Unknown",
    country: "Unknown",
    correlation_group: "Uncorrelated",
};

const fn meta(
    sector: &'static str,
    country: &'static str,
    correlation_group: &'static str,
) -> TickerMeta {
    TickerMeta {
        sector,
        country,
        correlation_group,
    }
}

/// Total lookup: every ticker maps somewhere.
pub fn ticker_meta(ticker: &str) -> TickerMeta {
    match ticker.to_uppercase().as_str() {
        // Argentine banks
        "GGAL" | "BMA" | "SUPV" | "BBAR" => meta("Financials", "Argentina", "Argentine Banks"),
        // Argentine energy and utilities
        "YPF" | "YPFD" | "PAMP" | "VIST" | "CEPU" | "TGSU2" | "TGNO4" | "EDN" => {
            meta("Energy", "Argentina", "Argentine Energy")
        }
        // Other BYMA large caps
        "TXAR" | "ALUA" => meta("Materials", "Argentina", "Argentine Industrials"),
        "MIRG" => meta("Consumer Discretionary", "Argentina", "Argentine Industrials"),
        "LOMA" => meta("Materials", "Argentina", "Argentine Industrials"),
        "MELI" => meta("Consumer Discretionary", "Argentina", "Latam Tech"),
        "GLOB" => meta("Technology", "Argentina", "Latam Tech"),
        // US tech CEDEARs
        "AAPL" | "MSFT" | "GOOGL" | "GOOG" | "AMZN" | "META" | "NVDA" | "TSLA" => {
            meta("Technology", "United States", "US Tech")
        }
        // US banks
        "JPM" | "BAC" | "C" | "WFC" | "GS" | "MS" => {
            meta("Financials", "United States", "US Banks")
        }
        // US broad market / index-like
        "SPY" | "QQQ" | "DIA" => meta("Index", "United States", "US Broad Market"),
        "KO" | "PG" | "JNJ" | "MCD" | "WMT" => {
            meta("Consumer Staples", "United States", "US Defensives")
        }
        "XOM" | "CVX" => meta("Energy", "United States", "US Energy"),
        // Crypto majors
        "BTC" | "ETH" | "SOL" | "ADA" | "DOT" | "AVAX" | "MATIC" | "LTC" | "BNB" | "XRP"
        | "DOGE" | "LINK" | "UNI" | "ATOM" => meta("Crypto", "Global", "Crypto Majors"),
        // Stablecoins behave like cash
        "USDT" | "USDC" | "DAI" | "BUSD" => meta("Crypto", "Global", "Stablecoins"),
        // Cash balances
        "USD" | "ARS" => meta("Cash", "Global", "Cash"),
        _ => UNKNOWN,
    }
}
