pub mod campaigns;
pub mod config;
pub mod email;
pub mod error;
pub mod telemetry;
