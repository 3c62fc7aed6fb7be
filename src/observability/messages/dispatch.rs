// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for concurrent and dynamic dispatch.
//!
//! * Fork fan-in (both paths settled)
//! * Lazy factory resolution
//! * Branch and filter selection

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// Both paths of a fork settled.
///
/// # Log Level
/// `trace!` - Per-invocation detail
pub struct ForkJoined {
    pub main_succeeded: bool,
    pub fork_succeeded: bool,
}

impl Display for ForkJoined {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Fork joined: main {}, fork {}",
            outcome(self.main_succeeded),
            outcome(self.fork_succeeded)
        )
    }
}

impl StructuredLog for ForkJoined {
    fn log(&self) {
        tracing::trace!(
            main_succeeded = self.main_succeeded,
            fork_succeeded = self.fork_succeeded,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::trace_span!(
            "fork_joined",
            span_name = name,
            main_succeeded = self.main_succeeded,
            fork_succeeded = self.fork_succeeded,
        )
    }
}

fn outcome(succeeded: bool) -> &'static str {
    if succeeded {
        "ok"
    } else {
        "failed"
    }
}

/// A lazy factory produced the chain for this invocation.
///
/// # Log Level
/// `trace!` - Per-invocation detail
///
/// # Example
/// ```
/// use the_layercake::observability::messages::dispatch::LazyChainResolved;
///
/// let msg = LazyChainResolved { middleware_count: 2 };
///
/// tracing::trace!("{}", msg);
/// ```
pub struct LazyChainResolved {
    pub middleware_count: usize,
}

impl Display for LazyChainResolved {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Lazy factory resolved {} middleware", self.middleware_count)
    }
}

impl StructuredLog for LazyChainResolved {
    fn log(&self) {
        tracing::trace!(middleware_count = self.middleware_count, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::trace_span!(
            "lazy_resolved",
            span_name = name,
            middleware_count = self.middleware_count,
        )
    }
}

/// A predicate picked one side of a branch, filter or narrowing.
///
/// # Log Level
/// `trace!` - Per-invocation detail
pub struct BranchSelected<'a> {
    pub combinator: &'a str,
    pub matched: bool,
}

impl Display for BranchSelected<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        let side = if self.matched { "true" } else { "false" };
        write!(f, "{} selected the {} branch", self.combinator, side)
    }
}

impl StructuredLog for BranchSelected<'_> {
    fn log(&self) {
        tracing::trace!(
            combinator = self.combinator,
            matched = self.matched,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::trace_span!(
            "branch_selected",
            span_name = name,
            combinator = self.combinator,
            matched = self.matched,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fork_joined_reports_each_path() {
        let msg = ForkJoined {
            main_succeeded: true,
            fork_succeeded: false,
        };

        assert_eq!(msg.to_string(), "Fork joined: main ok, fork failed");
    }

    #[test]
    fn test_branch_selected_wording() {
        let msg = BranchSelected {
            combinator: "filter",
            matched: false,
        };

        assert_eq!(msg.to_string(), "filter selected the false branch");
    }
}
