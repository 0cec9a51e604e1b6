pub mod aggregate;
pub mod buffer;
pub mod config;
pub mod forward;
pub mod ingest;
pub mod relay;
pub mod sample;
