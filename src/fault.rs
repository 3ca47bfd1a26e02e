//! Helpers for containing plugin faults.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};

/// Extract a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Run a synchronous plugin call, turning a panic into `Err(message)`.
pub(crate) fn contain<T>(f: impl FnOnce() -> T) -> std::result::Result<T, String> {
    catch_unwind(AssertUnwindSafe(f)).map_err(|payload| panic_message(payload.as_ref()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contain_passes_values_through() {
        assert_eq!(contain(|| 7), Ok(7));
    }

    #[test]
    fn contain_captures_str_and_string_panics() {
        let err = contain(|| -> u8 { panic!("static message") }).unwrap_err();
        assert_eq!(err, "static message");

        let code = 42;
        let err = contain(|| -> u8 { panic!("formatted {}", code) }).unwrap_err();
        assert_eq!(err, "formatted 42");
    }
}
