use sea_orm::error::DbErr;
use sea_orm::TransactionError;
use thiserror::Error;

/// Error taxonomy for ledger operations.
///
/// Every mutating operation validates before touching storage; once a
/// transaction begins, either the balance update and the movement append both
/// commit or neither is visible. Transient storage conflicts are not retried
/// here and surface as `DatabaseError`.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    /// The referenced product exists but is inactive, so stock operations
    /// against it are meaningless.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// An adjustment would drive the balance negative.
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    /// An outbound movement would drive the balance negative. Callers must
    /// treat this as a hard stop and roll back their own operation.
    #[error("Insufficient stock: {0}")]
    InsufficientStock(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl ServiceError {
    /// Helper for mapping database errors in `map_err` chains.
    pub fn db_error(err: DbErr) -> Self {
        ServiceError::DatabaseError(err)
    }
}

impl From<TransactionError<ServiceError>> for ServiceError {
    fn from(err: TransactionError<ServiceError>) -> Self {
        match err {
            TransactionError::Connection(db_err) => ServiceError::DatabaseError(db_err),
            TransactionError::Transaction(service_err) => service_err,
        }
    }
}
