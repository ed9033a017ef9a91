use sea_orm::error::DbErr;
use serde::Serialize;
use strum::{AsRefStr, Display, EnumString};

/// Error categories exposed to callers of the demand planning operations.
///
/// Every [`ServiceError`] maps onto exactly one kind; API layers translate
/// the kind into their own status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Rejected before any mutation (bad percentage, empty description, malformed filter)
    InvalidArgument,
    /// The requested scope matched no rows; nothing was written
    NotFound,
    /// Store or transaction failure; every effect was rolled back
    Internal,
}

#[derive(Debug, thiserror::Error, Serialize)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(
        #[from]
        #[serde(skip)]
        sea_orm::error::DbErr,
    ),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    #[error("Migration error: {0}")]
    MigrationError(String),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

pub trait IntoDbErr {
    fn into_db_err(self) -> DbErr;
}

impl IntoDbErr for DbErr {
    fn into_db_err(self) -> DbErr {
        self
    }
}

impl IntoDbErr for String {
    fn into_db_err(self) -> DbErr {
        DbErr::Custom(self)
    }
}

impl ServiceError {
    /// Generic constructor that normalizes any supported database error input.
    pub fn db_error<E: IntoDbErr>(error: E) -> Self {
        ServiceError::DatabaseError(error.into_db_err())
    }

    /// Returns the caller-facing category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ValidationError(_) | Self::InvalidInput(_) => ErrorKind::InvalidArgument,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::DatabaseError(_) | Self::TransactionFailed(_) | Self::MigrationError(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// Returns the error message suitable for callers.
    /// Internal errors return generic messages to avoid leaking implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::TransactionFailed(_) => "Transaction failed and was rolled back".to_string(),
            Self::MigrationError(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }

    /// Wraps a failure that happened inside an open transaction.
    ///
    /// Caller-facing errors pass through untouched so that a `NotFound`
    /// raised mid-transaction still reaches the caller as `NotFound`.
    pub fn in_transaction(self, stage: impl std::fmt::Display) -> Self {
        match self {
            Self::NotFound(_) | Self::ValidationError(_) | Self::InvalidInput(_) => self,
            Self::TransactionFailed(_) => self,
            other => Self::TransactionFailed(format!("{}: {}", stage, other)),
        }
    }
}

pub type AppError = ServiceError;
