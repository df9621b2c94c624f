//! Financial market analysis on top of the agent workspace
//!
//! This crate turns a natural-language question about Korean financial
//! markets into a structured report. It includes:
//!
//! - A query classifier mapping questions to analysis intents and entities
//!   (rule based, optionally backed by a language model)
//! - Tools for web search (Tavily), market data (Yahoo Finance) and
//!   language model summaries
//! - Agents for market trends, sectors, companies and geopolitical impact
//! - A report compiler and markdown/PDF renderers
//!
//! # Architecture
//!
//! [`AnalysisEngine`] classifies a query, hands the intents to the
//! `agent-workflow` supervisor which plans and runs the agents, and compiles
//! the resulting bundle into a [`Report`]:
//!
//! - `MarketTrendAgent`: market-wide news and themes
//! - `SectorAgent`: sector news plus a price comparison of sector leaders
//! - `CompanyAgent`: company research and price snapshots
//! - `GeopoliticalAgent`: policy impact, using market trend results when available
//!
//! # Example
//!
//! ```rust,ignore
//! use agent_finance::{AnalysisEngine, FinanceConfig, OutputFormat};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = FinanceConfig::builder().with_env().build()?;
//!     let engine = AnalysisEngine::new(config).await?;
//!
//!     let analysis = engine
//!         .analyze("은행 업종 전망", &CancellationToken::new())
//!         .await?;
//!     let path = engine.write_report(&analysis.report, OutputFormat::Markdown).await?;
//!     println!("{}", path.display());
//!
//!     engine.shutdown().await?;
//!     Ok(())
//! }
//! ```

pub mod agents;
pub mod api;
pub mod classifier;
pub mod config;
pub mod engine;
pub mod error;
pub mod report;
pub mod tools;
pub mod universe;

pub use classifier::{LlmClassifier, QueryClassifier, RuleClassifier};
pub use config::{ClassifierMode, FinanceConfig, FinanceConfigBuilder, LlmConfig, SearchConfig};
pub use engine::{Analysis, AnalysisEngine, EngineBuilder};
pub use error::{FinanceError, Result};
pub use report::{OutputFormat, Report, ReportCompiler, ReportWriter};
pub use universe::{Company, CompanyUniverse, Sector};
