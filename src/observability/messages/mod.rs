// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Centralized message types for structured logging.
//!
//! * `engine` - execution lifecycle (start, completion, halt, failure) and
//!   continuation reuse
//! * `dispatch` - fork joins, lazy resolution and branch selection

use tracing::Span;

pub mod dispatch;
pub mod engine;

/// A message that knows its own log level and structured fields.
pub trait StructuredLog {
    /// Emit the message as a tracing event.
    fn log(&self);

    /// Build a span carrying the same fields.
    fn span(&self, name: &str) -> Span;
}
