//! Filesystem helpers.
//!
//! Atomic replacement keeps the undelivered-report journal readable even if
//! the process dies halfway through a rewrite.

pub mod atomic;

pub use atomic::atomic_write;
