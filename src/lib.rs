pub mod calendar;
pub mod config;
pub mod tracing;
pub mod unf_portal;
