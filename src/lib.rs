//! # Spending Insights
//!
//! Dashboard aggregation and spending insights for a personal-finance
//! transaction log.
//!
//! ## Core Concepts
//!
//! - **Transactions**: positive amounts tagged INCOME or EXPENSE, owned by a user
//! - **Periods**: month-to-date plus a six-month trend window, computed in the user's time zone
//! - **Dashboard**: balance, category breakdown and trend series rebuilt from store aggregates
//! - **Insights**: a remote generator is tried first; any failure degrades to a local heuristic
//! - **Export**: the full history as CSV text
//!
//! ## Example
//!
//! ```rust,ignore
//! use spending_insights::*;
//! use std::sync::Arc;
//!
//! let service = FinanceService::new(
//!     Arc::new(InMemoryTransactionStore::new()),
//!     Arc::new(InMemoryPreferences::default()),
//!     SystemClock,
//!     InsightsConfig::from_env()?,
//! );
//!
//! service
//!     .add_transaction(
//!         "alice",
//!         NewTransaction {
//!             amount: 42.5,
//!             category: "Food".to_string(),
//!             description: "Lunch".to_string(),
//!             transaction_type: TransactionType::Expense,
//!             date: chrono::Utc::now(),
//!         },
//!     )
//!     .await?;
//!
//! let dashboard = service.dashboard("alice").await?;
//! for insight in &dashboard.ai_insights {
//!     println!("{:?}: {}", insight.insight_type, insight.message);
//! }
//! ```

pub mod config;
pub mod dashboard;
pub mod error;
pub mod export;
pub mod format;
pub mod insights;
pub mod periods;
pub mod preferences;
pub mod prompts;
pub mod schema;
pub mod service;
pub mod store;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "gemini")]
pub mod llm;

pub use config::{InsightsConfig, DEFAULT_GEMINI_MODEL, DEFAULT_PERIOD_DAYS};
pub use dashboard::{category_breakdown, DashboardAggregator};
pub use error::{InsightsError, Result};
pub use export::export_csv;
pub use format::{format_decimal, format_money, month_label, Locale};
pub use insights::{
    local_insights, parse_insight_response, GeneratedInsights, InsightGenerator, InsightService,
    InsightSource, WARNING_THRESHOLD_PERCENT,
};
pub use periods::{
    current_month_range, month_range, trailing_months, Clock, DateRange, FixedClock, MonthPeriod,
    SystemClock, TREND_MONTHS,
};
pub use preferences::{InMemoryPreferences, PreferenceStore};
pub use schema::*;
pub use service::FinanceService;
pub use store::{filter_transactions, InMemoryTransactionStore, TransactionFilter, TransactionStore};

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteTransactionStore;

#[cfg(feature = "gemini")]
pub use llm::GeminiClient;
