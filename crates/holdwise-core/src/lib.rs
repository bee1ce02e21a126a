pub mod annual;
pub mod comparison;
pub mod error;
pub mod model;
pub mod projection;
pub mod schedules;
pub mod tax;
pub mod terminal;
pub mod time_value;
pub mod types;

#[cfg(feature = "risk")]
pub mod risk;

#[cfg(feature = "scenarios")]
pub mod scenarios;

#[cfg(feature = "estimation")]
pub mod estimation;

pub use error::HoldwiseError;
pub use types::*;

/// Standard result type for all holdwise operations
pub type HoldwiseResult<T> = Result<T, HoldwiseError>;
