//! Exit code constants for the subnet-agent binary.
//!
//! - 0: Success
//! - 1: Configuration or usage error
//! - 2: Lifecycle method called in the wrong state
//! - 3: Transport failure (validator or matcher unreachable after retries)
//! - 4: Validation failure (validator rejected a report)

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// Missing or invalid configuration, bad arguments, local I/O failure.
pub const CONFIG_ERROR: i32 = 1;

/// Lifecycle method invoked in the wrong state.
pub const ILLEGAL_STATE: i32 = 2;

/// Network failure that outlived the retry policy.
pub const TRANSPORT_FAILURE: i32 = 3;

/// Permanent rejection from the validator.
pub const VALIDATION_FAILURE: i32 = 4;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_distinct() {
        let codes = [
            SUCCESS,
            CONFIG_ERROR,
            ILLEGAL_STATE,
            TRANSPORT_FAILURE,
            VALIDATION_FAILURE,
        ];
        for (i, &a) in codes.iter().enumerate() {
            for (j, &b) in codes.iter().enumerate() {
                if i != j {
                    assert_ne!(a, b, "Exit codes must be distinct");
                }
            }
        }
    }

    #[test]
    fn success_is_zero() {
        assert_eq!(SUCCESS, 0);
    }
}
