pub mod cache;
pub mod commands;
pub mod competitions;
pub mod data_fetcher;
pub mod export;
pub mod forebet;
pub mod form_strength;
pub mod form_summary;
pub mod message_builder;
pub mod normalizer;
pub mod predictor;
pub mod ranking;
pub mod telegram;

pub use competitions::CompetitionIndex;
pub use data_fetcher::DataFetcher;
