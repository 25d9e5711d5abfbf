// src/quotes/sources/mod.rs
mod alpha_vantage;
mod yahoo;

pub use alpha_vantage::AlphaVantageQuoteSource;
pub use yahoo::YahooQuoteSource;
