// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The sequencer: joins middleware into one.
//!
//! [`concat`] is the only way two steps are ever linked. It wraps the
//! continuation handed to the first step so that the second step runs when
//! (and only when) the first one resumes the chain, and it turns a second
//! resume of the same continuation into [`ComposeError::ContinuationReused`].
//! Because `concat` returns a middleware of the same shape it accepts, any
//! ordered list folds left with it ([`fold`]); [`pass`] is the identity.

use std::future::ready;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::errors::{ComposeError, ComposeResult};
use crate::observability::messages::{engine::ContinuationReused, StructuredLog};
use crate::traits::{BoxFuture, Chain, Middleware, MiddlewareFn, Next};

/// The identity step: hands the context straight to its continuation.
pub fn pass<C>() -> MiddlewareFn<C>
where
    C: Send + 'static,
{
    Arc::new(|ctx: C, next: Next<C>| next.run(ctx))
}

/// Reduce either middleware shape to the callable form.
pub fn flatten<C>(middleware: &Middleware<C>) -> MiddlewareFn<C> {
    match middleware {
        Middleware::Fn(func) => Arc::clone(func),
        Middleware::Provider(provider) => provider.middleware(),
    }
}

/// Run `first`, then `second` once `first` resumes the chain.
///
/// Every invocation of the returned middleware gets its own reuse flag, so
/// concurrent invocations never see each other's state.
pub fn concat<C>(first: MiddlewareFn<C>, second: MiddlewareFn<C>) -> MiddlewareFn<C>
where
    C: Send + 'static,
{
    Arc::new(move |ctx: C, next: Next<C>| {
        let fired = Arc::new(AtomicBool::new(false));
        let second = Arc::clone(&second);
        let resume = Next::new(move |new_ctx: C| -> BoxFuture<'static, ComposeResult<()>> {
            if fired.swap(true, Ordering::AcqRel) {
                ContinuationReused { site: "sequencer" }.log();
                return Box::pin(ready(Err::<(), _>(ComposeError::ContinuationReused)));
            }
            second(new_ctx, next.clone())
        });
        first(ctx, resume)
    })
}

/// Left-fold an ordered list with [`concat`]. An empty list folds to [`pass`].
pub fn fold<C, I>(middleware: I) -> MiddlewareFn<C>
where
    C: Send + 'static,
    I: IntoIterator<Item = MiddlewareFn<C>>,
{
    middleware.into_iter().reduce(concat).unwrap_or_else(pass)
}

impl<C> Chain<C>
where
    C: Send + 'static,
{
    /// Flatten every entry and fold them into one middleware.
    pub fn compose(&self) -> MiddlewareFn<C> {
        fold(self.iter().map(flatten))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::runner::{run, Settled};
    use crate::traits::{from_fn, MiddlewareProvider};

    fn push(value: u8) -> MiddlewareFn<Vec<u8>> {
        Arc::new(move |mut ctx: Vec<u8>, next: Next<Vec<u8>>| {
            ctx.push(value);
            next.run(ctx)
        })
    }

    async fn completed(mw: MiddlewareFn<Vec<u8>>) -> ComposeResult<Vec<u8>> {
        match run(Vec::new(), &mw).await? {
            Settled::Completed(ctx) => Ok(ctx),
            Settled::Halted => panic!("chain halted"),
        }
    }

    #[tokio::test]
    async fn test_pass_is_identity() {
        let ctx = completed(pass()).await.unwrap();
        assert!(ctx.is_empty());
    }

    #[tokio::test]
    async fn test_concat_runs_in_order() {
        let ctx = completed(concat(push(1), push(2))).await.unwrap();
        assert_eq!(ctx, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_concat_is_associative() {
        let left = concat(concat(push(1), push(2)), push(3));
        let right = concat(push(1), concat(push(2), push(3)));

        assert_eq!(completed(left).await.unwrap(), vec![1, 2, 3]);
        assert_eq!(completed(right).await.unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_fold_empty_is_pass() {
        let ctx = completed(fold(Vec::new())).await.unwrap();
        assert!(ctx.is_empty());
    }

    #[tokio::test]
    async fn test_second_resume_is_rejected() {
        let twice: MiddlewareFn<Vec<u8>> = Arc::new(
            |ctx: Vec<u8>, next: Next<Vec<u8>>| -> BoxFuture<'static, ComposeResult<()>> {
                Box::pin(async move {
                    if let Err(err) = next.run(ctx.clone()).await {
                        return Err(err);
                    }
                    next.run(ctx).await
                })
            },
        );

        let err = completed(concat(twice, push(9))).await.unwrap_err();
        assert!(err.is_continuation_reused());
    }

    #[tokio::test]
    async fn test_flags_are_per_invocation() {
        let chain = concat(push(1), push(2));

        for _ in 0..3 {
            assert_eq!(completed(Arc::clone(&chain)).await.unwrap(), vec![1, 2]);
        }
    }

    struct Pusher(u8);

    impl MiddlewareProvider<Vec<u8>> for Pusher {
        fn middleware(&self) -> MiddlewareFn<Vec<u8>> {
            push(self.0)
        }
    }

    #[tokio::test]
    async fn test_flatten_handles_both_shapes() {
        let chain = Chain::from(vec![
            from_fn(|mut ctx: Vec<u8>, next: Next<Vec<u8>>| async move {
                ctx.push(1);
                next.run(ctx).await
            }),
            Middleware::provider(Pusher(2)),
        ]);

        assert_eq!(completed(chain.compose()).await.unwrap(), vec![1, 2]);
    }
}
