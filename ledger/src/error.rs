use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// A mutation would break a ledger invariant. Indicates a bug upstream.
    #[error("ledger invariant violated: {0}")]
    InvariantViolation(String),

    #[error("arithmetic overflow in ledger update")]
    Overflow,

    #[error("serialization error: {0}")]
    Serialization(String),
}
