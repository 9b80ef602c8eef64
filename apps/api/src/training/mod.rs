pub mod dataset;
pub mod forest;
pub mod metrics;
pub mod pipeline;
pub mod split;
pub mod synthetic;
