//! Deadlock properties under concurrent load.
//!
//! All tests run on a paused clock with fixed stage delays, so lock
//! interleavings are deterministic.

mod ordering;
mod cleanup;
