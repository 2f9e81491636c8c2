use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum LedgerError {
    #[error("Validation error: {0}")]
    #[diagnostic(code(ledger::validation))]
    ValidationError(String),

    /// Missing and not-owned collapse into this one variant.
    #[error("{0} not found or not permitted")]
    #[diagnostic(code(ledger::not_found))]
    NotFound(&'static str),

    #[error("Athlete blocked for non-payment: an installment is {overdue_days} days overdue")]
    #[diagnostic(
        code(ledger::payment_blocked),
        help("mark the overdue installments as paid before logging more distance")
    )]
    PaymentBlocked { overdue_days: i64 },

    #[error("CSV error: {0}")]
    #[diagnostic(code(ledger::csv))]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    #[diagnostic(code(ledger::io))]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    #[diagnostic(code(ledger::serde))]
    SerdeError(#[from] serde_json::Error),

    #[cfg(feature = "storage-rocksdb")]
    #[error("RocksDB error: {0}")]
    #[diagnostic(code(ledger::storage))]
    RocksDbError(#[from] rocksdb::Error),

    #[error("Internal error: {0}")]
    #[diagnostic(code(ledger::internal))]
    InternalError(Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T> = std::result::Result<T, LedgerError>;

impl LedgerError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError(message.into())
    }
}
