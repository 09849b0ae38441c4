//! Shared helpers for PostgreSQL error and row conversion.

use quarry_core::error::StorageError;

/// SQLSTATE for unique_violation.
const UNIQUE_VIOLATION: &str = "23505";

/// Map a sqlx error to a [`StorageError`], keeping unique index violations
/// distinguishable from other query failures.
pub fn query_error(err: sqlx::Error) -> StorageError {
    if let sqlx::Error::Database(db_err) = &err
        && db_err.code().as_deref() == Some(UNIQUE_VIOLATION)
    {
        return StorageError::ConstraintViolation(db_err.message().to_string());
    }
    StorageError::QueryError(err.to_string())
}

/// Convert a stored BIGINT counter back to `u64`, rejecting negatives as corrupt.
pub fn non_negative(value: i64, field_name: &str) -> Result<u64, StorageError> {
    u64::try_from(value).map_err(|_| {
        StorageError::SerializationError(format!(
            "{} is negative ({}), which indicates data corruption",
            field_name, value
        ))
    })
}

/// Convert a `u64` to BIGINT for binding.
pub fn to_bigint(value: u64, field_name: &str) -> Result<i64, StorageError> {
    i64::try_from(value).map_err(|_| {
        StorageError::SerializationError(format!(
            "{} does not fit in BIGINT: {}",
            field_name, value
        ))
    })
}
