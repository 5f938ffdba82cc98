//! Error types for warden.
//!
//! Uses thiserror for derive macros and provides user-actionable error messages.
//! Lock failures carry their own taxonomy (`LockError`) and are wrapped here.

use crate::exit_codes;
use crate::locks::LockError;
use thiserror::Error;

/// Main error type for warden operations.
#[derive(Error, Debug)]
pub enum WardenError {
    /// User provided invalid arguments or the configuration is invalid.
    #[error("{0}")]
    UserError(String),

    /// A stored record could not be read, parsed, or written.
    #[error("Store operation failed: {0}")]
    StoreError(String),

    /// A resource lock could not be acquired or released.
    #[error("Lock operation failed: {0}")]
    Lock(#[from] LockError),
}

impl WardenError {
    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            WardenError::UserError(_) => exit_codes::USER_ERROR,
            WardenError::StoreError(_) => exit_codes::STORE_FAILURE,
            WardenError::Lock(_) => exit_codes::LOCK_FAILURE,
        }
    }
}

/// Result type alias for warden operations.
pub type Result<T> = std::result::Result<T, WardenError>;
