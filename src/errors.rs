use thiserror::Error;

/// Malformed route construction inputs. Fatal to the call that produced it,
/// never retried.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("path/fee lengths do not match: {tokens} tokens, {fees} fees")]
    LengthMismatch { tokens: usize, fees: usize },
    #[error("route needs at least two tokens")]
    TooShort,
}

/// A leg of a simulated batch reverted. The candidate route/fraction is
/// infeasible and is dropped from consideration.
#[derive(Debug, Error, Clone)]
#[error("simulation failed at call {index}: {reason}")]
pub struct SimulationFailure {
    pub index: usize,
    pub reason: String,
}

/// `exec` was called on a strategy before `find_best` produced a result.
#[derive(Debug, Error)]
#[error("no opportunity found yet")]
pub struct NoOpportunityError;

/// The chosen opportunity failed at submission time, or the private relay
/// path rejected the transaction.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("transaction reverted on-chain: {0}")]
    Reverted(String),
    #[error("submission failed: {0}")]
    Submission(String),
    #[error("private relay rejected the transaction: {0}")]
    RelayRejected(String),
    #[error("no opportunity found yet")]
    NoOpportunity(#[from] NoOpportunityError),
}

impl ExecutionError {
    /// True when the public submission path should still be attempted after
    /// re-checking profitability against fresh fee conditions.
    pub fn is_relay_failure(&self) -> bool {
        matches!(self, ExecutionError::RelayRejected(_))
    }
}
