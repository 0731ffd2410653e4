//! Shared foundational types used across the Kiln build core.
//!
//! This crate provides content hashing for change detection, target identity
//! (module name plus production/test kind), and the cooperative cancellation
//! flag polled by compilers during long-running work.

#![warn(missing_docs)]

pub mod cancel;
pub mod hash;
pub mod target;

pub use cancel::{Cancelled, CancellationFlag};
pub use hash::{ContentHash, ParseHashError};
pub use target::{ParseTargetIdError, TargetId, TargetKind};
