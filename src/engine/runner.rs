// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The execution engine: drives one middleware against an initial context.

use std::future::ready;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::errors::{ComposeError, ComposeResult};
use crate::observability::messages::{engine::ContinuationReused, StructuredLog};
use crate::traits::{BoxFuture, MiddlewareFn, Next};

/// How a run settled when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settled<C> {
    /// The final continuation fired with this context.
    Completed(C),
    /// The chain finished without ever reaching its end; some middleware
    /// chose not to call its continuation.
    Halted,
}

impl<C> Settled<C> {
    pub fn is_halted(&self) -> bool {
        matches!(self, Self::Halted)
    }

    pub fn into_completed(self) -> Option<C> {
        match self {
            Self::Completed(ctx) => Some(ctx),
            Self::Halted => None,
        }
    }
}

/// Run `middleware` once against `ctx`.
///
/// The middleware future is driven to completion in place. Any error it
/// returns, including one raised after the final continuation already fired,
/// fails the run unchanged.
pub async fn run<C>(ctx: C, middleware: &MiddlewareFn<C>) -> ComposeResult<Settled<C>>
where
    C: Send + 'static,
{
    let slot: Arc<Mutex<Option<C>>> = Arc::new(Mutex::new(None));
    let fired = AtomicBool::new(false);

    let resolve = {
        let slot = Arc::clone(&slot);
        Next::new(move |final_ctx: C| -> BoxFuture<'static, ComposeResult<()>> {
            if fired.swap(true, Ordering::AcqRel) {
                ContinuationReused { site: "terminal" }.log();
                return Box::pin(ready(Err::<(), _>(ComposeError::ContinuationReused)));
            }
            *slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(final_ctx);
            Box::pin(ready(Ok::<(), ComposeError>(())))
        })
    };

    middleware(ctx, resolve).await?;

    let settled = slot.lock().unwrap_or_else(PoisonError::into_inner).take();
    Ok(match settled {
        Some(final_ctx) => Settled::Completed(final_ctx),
        None => Settled::Halted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Refused;

    impl std::fmt::Display for Refused {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("refused")
        }
    }

    impl std::error::Error for Refused {}

    #[tokio::test]
    async fn test_completed_with_final_context() {
        let add_one: MiddlewareFn<u32> = Arc::new(|n: u32, next: Next<u32>| next.run(n + 1));

        let settled = run(41, &add_one).await.unwrap();
        assert_eq!(settled, Settled::Completed(42));
    }

    #[tokio::test]
    async fn test_short_circuit_halts() {
        let stop: MiddlewareFn<u32> =
            Arc::new(|_: u32, _: Next<u32>| -> BoxFuture<'static, ComposeResult<()>> {
                Box::pin(async { Ok::<(), ComposeError>(()) })
            });

        let settled = run(1, &stop).await.unwrap();
        assert!(settled.is_halted());
        assert_eq!(settled.into_completed(), None);
    }

    #[tokio::test]
    async fn test_error_propagates_unchanged() {
        let refuse: MiddlewareFn<u32> = Arc::new(|_: u32, _: Next<u32>| -> BoxFuture<'static, ComposeResult<()>> {
            Box::pin(async { Err::<(), _>(ComposeError::middleware(Refused)) })
        });

        let err = run(1, &refuse).await.unwrap_err();
        assert!(err.downcast_ref::<Refused>().is_some());
    }

    #[tokio::test]
    async fn test_error_after_resume_still_fails() {
        let late: MiddlewareFn<u32> = Arc::new(|n: u32, next: Next<u32>| -> BoxFuture<'static, ComposeResult<()>> {
            Box::pin(async move {
                next.run(n).await?;
                Err::<(), _>(ComposeError::middleware(Refused))
            })
        });

        assert!(run(1, &late).await.is_err());
    }

    #[tokio::test]
    async fn test_terminal_fires_once() {
        let twice: MiddlewareFn<u32> = Arc::new(|n: u32, next: Next<u32>| -> BoxFuture<'static, ComposeResult<()>> {
            Box::pin(async move {
                if let Err(err) = next.run(n).await {
                    return Err(err);
                }
                next.run(n).await
            })
        });

        let err = run(1, &twice).await.unwrap_err();
        assert!(err.is_continuation_reused());
    }
}
