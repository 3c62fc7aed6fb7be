// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for execution lifecycle events.
//!
//! This module contains message types for logging events related to:
//! * Composer execution lifecycle (start, completion, halt, failure)
//! * Protocol violations detected by the sequencer

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use std::time::Duration;
use tracing::Span;

/// Execution of a composer started.
///
/// # Log Level
/// `debug!` - Fires once per `execute()` call
///
/// # Example
/// ```
/// use the_layercake::observability::messages::engine::ExecutionStarted;
///
/// let msg = ExecutionStarted {
///     before_stage: 1,
///     main_stage: 3,
///     after_stage: 1,
/// };
///
/// tracing::debug!("{}", msg);
/// ```
pub struct ExecutionStarted {
    pub before_stage: usize,
    pub main_stage: usize,
    pub after_stage: usize,
}

impl Display for ExecutionStarted {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Starting execution: {} before, {} main, {} after registrations",
            self.before_stage, self.main_stage, self.after_stage
        )
    }
}

impl StructuredLog for ExecutionStarted {
    fn log(&self) {
        tracing::debug!(
            before_stage = self.before_stage,
            main_stage = self.main_stage,
            after_stage = self.after_stage,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "execute",
            span_name = name,
            before_stage = self.before_stage,
            main_stage = self.main_stage,
            after_stage = self.after_stage,
        )
    }
}

/// Execution reached the end of the chain.
///
/// # Log Level
/// `debug!` - Fires once per successful `execute()` call
pub struct ExecutionCompleted {
    pub duration: Duration,
}

impl Display for ExecutionCompleted {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Execution completed in {:?}", self.duration)
    }
}

impl StructuredLog for ExecutionCompleted {
    fn log(&self) {
        tracing::debug!(
            duration_us = self.duration.as_micros() as u64,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "execution_completed",
            span_name = name,
            duration = ?self.duration,
        )
    }
}

/// Execution settled without the final continuation firing.
///
/// # Log Level
/// `debug!` - A middleware short-circuited; this is not a failure
pub struct ExecutionHalted {
    pub duration: Duration,
}

impl Display for ExecutionHalted {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Execution halted by a short-circuiting middleware after {:?}",
            self.duration
        )
    }
}

impl StructuredLog for ExecutionHalted {
    fn log(&self) {
        tracing::debug!(
            duration_us = self.duration.as_micros() as u64,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "execution_halted",
            span_name = name,
            duration = ?self.duration,
        )
    }
}

/// Execution failed with error.
///
/// # Log Level
/// `error!` - Failure requiring attention
///
/// # Example
/// ```
/// use the_layercake::observability::messages::engine::ExecutionFailed;
/// use std::time::Duration;
///
/// let error = std::io::Error::new(std::io::ErrorKind::Other, "test error");
/// let msg = ExecutionFailed {
///     error: &error,
///     duration: Duration::from_millis(5),
/// };
///
/// tracing::error!("{}", msg);
/// ```
pub struct ExecutionFailed<'a> {
    pub error: &'a dyn std::error::Error,
    pub duration: Duration,
}

impl Display for ExecutionFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Execution failed after {:?}: {}",
            self.duration, self.error
        )
    }
}

impl StructuredLog for ExecutionFailed<'_> {
    fn log(&self) {
        tracing::error!(
            error = %self.error,
            duration_us = self.duration.as_micros() as u64,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!(
            "execution_failed",
            span_name = name,
            error = %self.error,
        )
    }
}

/// A continuation fired a second time within one invocation.
///
/// # Log Level
/// `warn!` - A middleware bug; the invocation fails right after this
///
/// # Example
/// ```
/// use the_layercake::observability::messages::engine::ContinuationReused;
///
/// let msg = ContinuationReused { site: "sequencer" };
///
/// tracing::warn!("{}", msg);
/// ```
pub struct ContinuationReused<'a> {
    /// `"sequencer"` for a concat'd step, `"terminal"` for the end of a run.
    pub site: &'a str,
}

impl Display for ContinuationReused<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Continuation reused at {}: next was called twice in one invocation",
            self.site
        )
    }
}

impl StructuredLog for ContinuationReused<'_> {
    fn log(&self) {
        tracing::warn!(site = self.site, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("continuation_reused", span_name = name, site = self.site)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_started_message_lists_every_stage() {
        let msg = ExecutionStarted {
            before_stage: 2,
            main_stage: 5,
            after_stage: 0,
        };

        assert_eq!(
            msg.to_string(),
            "Starting execution: 2 before, 5 main, 0 after registrations"
        );
    }

    #[test]
    fn test_failed_message_includes_error() {
        let error = std::io::Error::new(std::io::ErrorKind::Other, "disk on fire");
        let msg = ExecutionFailed {
            error: &error,
            duration: Duration::from_millis(2),
        };

        assert_eq!(msg.to_string(), "Execution failed after 2ms: disk on fire");
    }

    #[test]
    fn test_continuation_reused_names_site() {
        let msg = ContinuationReused { site: "terminal" };

        assert!(msg.to_string().contains("at terminal"));
    }
}
