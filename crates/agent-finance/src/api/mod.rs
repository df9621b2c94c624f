//! API clients for search and market data providers

pub mod tavily;
pub mod yahoo;

pub use tavily::{SearchResult, TavilyClient};
pub use yahoo::{Quote, YahooFinanceClient};
