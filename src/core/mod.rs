//! Core business logic abstractions

pub mod article;
pub mod config;
pub mod error;
pub mod log;
pub mod rate;

// Re-export main types for cleaner imports
pub use article::{ArticleFeedProvider, NewsArticle, RawArticle};
pub use error::{Error, Result};
pub use rate::{Currency, DateWindow, ExchangeRate, RateSeries, RateSeriesProvider, SortOrder};
