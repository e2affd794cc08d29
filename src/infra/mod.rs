pub mod error;
pub mod fetch;
pub mod http;
pub mod telemetry;
pub mod templates;
