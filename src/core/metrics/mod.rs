pub mod exporter_metrics;
pub mod serve_metrics;
