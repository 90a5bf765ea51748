//! # chat-core
//!
//! Pure feed logic for friendlychat (no I/O, instant tests).
//!
//! This crate implements the subscription state machine and resume
//! bookkeeping for a chat feed without any store access or async code.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects. This enables:
//! - Instant unit tests (no mocks, no async)
//! - Deterministic behavior (same input → same output)
//! - Easy reasoning about state transitions
//!
//! The actual store calls are made by `chat-client`, which interprets the
//! actions produced by these state machines.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod resume;
pub mod state;

pub use resume::ResumeTracker;
pub use state::{Action, Event, FeedState, Signal};
