//! Shared status board announcing transfer outcomes across contexts.
//!
//! The receiver and its consumers run in isolated execution contexts
//! with no shared call stack; the board is the rendezvous point. The
//! receiver is the only writer and always writes delete-then-rewrite,
//! so a record structurally identical to the previous one still
//! produces a change event. Consumers either subscribe to the change
//! stream or read records directly — or both, see the puller.

mod board;

pub use board::{StatusBoard, StatusChange};
