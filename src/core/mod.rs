pub mod app_context;
pub mod clients;
pub mod config;
pub mod exporter;
pub mod in_flight;
pub mod metrics;
pub mod repair;
pub mod startup;
pub mod utils;
