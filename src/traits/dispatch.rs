// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Seams for per-invocation dynamic dispatch.
//!
//! [`Predicate`] decides between branches and [`MiddlewareFactory`] picks the
//! chain that [`Composer::lazy`](crate::composer::Composer::lazy) runs. Both
//! are async so a decision may wait on I/O. Plain synchronous closures
//! implement them through blanket impls; [`predicate_fn`] and [`factory_fn`]
//! adapt closures that return futures.

use async_trait::async_trait;
use std::future::Future;

use crate::errors::ComposeResult;
use crate::traits::middleware::Chain;

/// Tests a context once per invocation.
///
/// An `Err` fails the invocation unchanged and neither side runs.
#[async_trait]
pub trait Predicate<C>: Send + Sync {
    async fn test(&self, ctx: &C) -> ComposeResult<bool>;
}

#[async_trait]
impl<C, F> Predicate<C> for F
where
    C: Sync,
    F: Fn(&C) -> bool + Send + Sync,
{
    async fn test(&self, ctx: &C) -> ComposeResult<bool> {
        Ok(self(ctx))
    }
}

/// Produces the middleware to run for one invocation.
///
/// Called exactly once per invocation of the step that owns it.
#[async_trait]
pub trait MiddlewareFactory<C>: Send + Sync {
    async fn create(&self, ctx: &C) -> ComposeResult<Chain<C>>;
}

#[async_trait]
impl<C, F, R> MiddlewareFactory<C> for F
where
    C: Sync,
    F: Fn(&C) -> R + Send + Sync,
    R: Into<Chain<C>>,
{
    async fn create(&self, ctx: &C) -> ComposeResult<Chain<C>> {
        Ok(self(ctx).into())
    }
}

/// Adapter for predicates that answer asynchronously or can fail.
///
/// The closure sees the context synchronously and returns an owned future, so
/// copy out whatever the future needs first.
pub struct PredicateFn<F>(F);

/// Build a [`Predicate`] from a closure returning a future.
///
/// ```
/// use the_layercake::traits::predicate_fn;
///
/// let is_odd = predicate_fn(|n: &u32| {
///     let n = *n;
///     async move { Ok(n % 2 == 1) }
/// });
/// ```
pub fn predicate_fn<C, F, Fut>(func: F) -> PredicateFn<F>
where
    F: Fn(&C) -> Fut + Send + Sync,
    Fut: Future<Output = ComposeResult<bool>> + Send,
{
    PredicateFn(func)
}

#[async_trait]
impl<C, F, Fut> Predicate<C> for PredicateFn<F>
where
    C: Sync,
    F: Fn(&C) -> Fut + Send + Sync,
    Fut: Future<Output = ComposeResult<bool>> + Send,
{
    async fn test(&self, ctx: &C) -> ComposeResult<bool> {
        (self.0)(ctx).await
    }
}

/// Adapter for factories that resolve asynchronously or can fail.
pub struct FactoryFn<F>(F);

/// Build a [`MiddlewareFactory`] from a closure returning a future.
pub fn factory_fn<C, F, Fut>(func: F) -> FactoryFn<F>
where
    F: Fn(&C) -> Fut + Send + Sync,
    Fut: Future<Output = ComposeResult<Chain<C>>> + Send,
{
    FactoryFn(func)
}

#[async_trait]
impl<C, F, Fut> MiddlewareFactory<C> for FactoryFn<F>
where
    C: Sync,
    F: Fn(&C) -> Fut + Send + Sync,
    Fut: Future<Output = ComposeResult<Chain<C>>> + Send,
{
    async fn create(&self, ctx: &C) -> ComposeResult<Chain<C>> {
        (self.0)(ctx).await
    }
}
