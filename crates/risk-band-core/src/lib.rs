pub mod association;
pub mod banding;
pub mod descriptive;
pub mod error;
pub mod logistic;
pub mod report;
pub mod types;

pub use error::RiskBandError;
pub use types::*;

/// Standard result type for all risk-band operations
pub type RiskBandResult<T> = Result<T, RiskBandError>;
