// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Error types for middleware composition and execution.
//!
//! Two kinds of failure exist. A protocol violation is raised by the engine
//! itself when a continuation fires twice within one invocation. Everything
//! else is an error produced by caller-supplied middleware; those travel
//! through the chain untouched so the host can still inspect the original
//! value.

use thiserror::Error;

/// Error produced while running a composed middleware chain.
#[derive(Error, Debug)]
pub enum ComposeError {
    /// A continuation belonging to one invocation fired a second time.
    #[error("continuation reused: next was already called for this invocation")]
    ContinuationReused,

    /// An error raised by user middleware, forwarded unchanged.
    #[error(transparent)]
    Middleware(#[from] anyhow::Error),
}

impl ComposeError {
    /// Wrap any error raised inside a middleware.
    pub fn middleware<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Middleware(anyhow::Error::new(error))
    }

    /// `true` for the double-continuation protocol violation.
    pub fn is_continuation_reused(&self) -> bool {
        matches!(self, Self::ContinuationReused)
    }

    /// Borrow the original user error if it has type `E`.
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: std::fmt::Display + std::fmt::Debug + Send + Sync + 'static,
    {
        match self {
            Self::Middleware(inner) => inner.downcast_ref::<E>(),
            Self::ContinuationReused => None,
        }
    }
}

/// Result type alias for composition operations.
pub type ComposeResult<T> = Result<T, ComposeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Teapot(u16);

    impl std::fmt::Display for Teapot {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "teapot {}", self.0)
        }
    }

    impl std::error::Error for Teapot {}

    #[test]
    fn test_user_error_keeps_identity() {
        let err = ComposeError::middleware(Teapot(418));

        assert_eq!(err.downcast_ref::<Teapot>(), Some(&Teapot(418)));
        assert_eq!(err.to_string(), "teapot 418");
        assert!(!err.is_continuation_reused());
    }

    #[test]
    fn test_anyhow_converts_with_question_mark() {
        fn parse(raw: &str) -> ComposeResult<u32> {
            let value = raw.parse::<u32>().map_err(anyhow::Error::from)?;
            Ok(value)
        }

        assert_eq!(parse("7").unwrap(), 7);
        let err = parse("seven").unwrap_err();
        assert!(err.downcast_ref::<std::num::ParseIntError>().is_some());
    }

    #[test]
    fn test_continuation_reused_message() {
        let err = ComposeError::ContinuationReused;

        assert!(err.is_continuation_reused());
        assert!(err.downcast_ref::<Teapot>().is_none());
        assert!(err.to_string().starts_with("continuation reused"));
    }
}
