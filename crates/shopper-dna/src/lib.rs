//! ShopperDNA turns a transactional order history into per-customer RFM
//! (recency, frequency, monetary) profiles and named behavioral segments.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
