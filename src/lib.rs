pub mod config;
pub mod constants;
pub mod dataset;
pub mod error;
pub mod logging;
pub mod output;
pub mod pipeline;
pub mod reconcile;
pub mod reference;
pub mod scrapers;
pub mod storage;
pub mod types;

// Port traits and their adapters
pub mod app;
pub mod infra;
