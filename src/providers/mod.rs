pub mod frankfurter;
pub mod gdelt;

// Re-export the provider seams for callers
pub use crate::core::article::ArticleFeedProvider;
pub use crate::core::rate::RateSeriesProvider;
