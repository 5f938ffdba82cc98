//! Exit code constants for the warden CLI.
//!
//! - 0: Success
//! - 1: User error (bad args, invalid state)
//! - 2: Store failure (unreadable or unwritable records)
//! - 4: Lock failure (timeout, invalid state, lock I/O)

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// User error: bad arguments, invalid configuration, or refused operation.
pub const USER_ERROR: i32 = 1;

/// Store failure: a record could not be read, parsed, or written.
pub const STORE_FAILURE: i32 = 2;

/// Lock failure: a resource lock could not be acquired or released.
pub const LOCK_FAILURE: i32 = 4;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_distinct() {
        let codes = [SUCCESS, USER_ERROR, STORE_FAILURE, LOCK_FAILURE];
        for (i, &a) in codes.iter().enumerate() {
            for (j, &b) in codes.iter().enumerate() {
                if i != j {
                    assert_ne!(a, b, "Exit codes must be distinct");
                }
            }
        }
    }

    #[test]
    fn lock_failure_is_four() {
        assert_eq!(LOCK_FAILURE, 4);
    }
}
