pub mod metrics;
pub mod result;
