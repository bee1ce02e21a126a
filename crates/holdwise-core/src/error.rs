use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HoldwiseError {
    #[error("Invalid input: {field} - {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Non-amortizing loan: payment never retires the balance ({balance_remaining} still owed after {months_simulated} months)")]
    NonAmortizingLoan {
        balance_remaining: Decimal,
        months_simulated: u32,
    },

    #[error("Convergence failure: {function} did not converge after {iterations} iterations (delta: {last_delta})")]
    ConvergenceFailure {
        function: String,
        iterations: u32,
        last_delta: Decimal,
    },

    #[error("Division by zero in {context}")]
    DivisionByZero { context: String },

    #[error("Scenario not found: no {kind} scenario named '{name}'")]
    ScenarioNotFound { kind: String, name: String },

    #[error("Date error: {0}")]
    DateError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for HoldwiseError {
    fn from(e: serde_json::Error) -> Self {
        HoldwiseError::SerializationError(e.to_string())
    }
}
