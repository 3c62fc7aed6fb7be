// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Middleware representations and the continuation handle.
//!
//! A middleware is accepted in two shapes:
//!
//! * the callable form, [`MiddlewareFn`], a shared async function taking the
//!   context and a [`Next`] continuation;
//! * the provider form, any [`MiddlewareProvider`] that hands out a callable on
//!   request (a [`Composer`](crate::composer::Composer) is one).
//!
//! [`Middleware`] holds either shape and [`crate::engine::flatten`] reduces it
//! to the callable form.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::errors::ComposeResult;

/// A heap-allocated, type-erased future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The callable form of a middleware.
///
/// The returned future reports whether the step itself failed. The context
/// only moves forward through the [`Next`] handle.
pub type MiddlewareFn<C> =
    Arc<dyn Fn(C, Next<C>) -> BoxFuture<'static, ComposeResult<()>> + Send + Sync>;

/// The provider form of a middleware: an object that produces the callable
/// form on demand.
///
/// Implementations should hand out behaviorally identical callables on every
/// call; nothing caches the result.
pub trait MiddlewareProvider<C>: Send + Sync {
    fn middleware(&self) -> MiddlewareFn<C>;
}

/// Either accepted middleware shape.
pub enum Middleware<C> {
    Fn(MiddlewareFn<C>),
    Provider(Arc<dyn MiddlewareProvider<C>>),
}

impl<C> Middleware<C> {
    /// Wrap a provider.
    pub fn provider<P>(provider: P) -> Self
    where
        P: MiddlewareProvider<C> + 'static,
    {
        Self::Provider(Arc::new(provider))
    }
}

impl<C> Clone for Middleware<C> {
    fn clone(&self) -> Self {
        match self {
            Self::Fn(func) => Self::Fn(Arc::clone(func)),
            Self::Provider(provider) => Self::Provider(Arc::clone(provider)),
        }
    }
}

impl<C> fmt::Debug for Middleware<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fn(_) => f.write_str("Middleware::Fn"),
            Self::Provider(_) => f.write_str("Middleware::Provider"),
        }
    }
}

impl<C> From<MiddlewareFn<C>> for Middleware<C> {
    fn from(func: MiddlewareFn<C>) -> Self {
        Self::Fn(func)
    }
}

/// Build a callable middleware from an async closure.
///
/// ```
/// use the_layercake::traits::{from_fn, Middleware, Next};
///
/// let double: Middleware<u32> = from_fn(|n: u32, next: Next<u32>| async move {
///     next.run(n * 2).await
/// });
/// ```
pub fn from_fn<C, F, Fut>(func: F) -> Middleware<C>
where
    C: 'static,
    F: Fn(C, Next<C>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ComposeResult<()>> + Send + 'static,
{
    let erased: MiddlewareFn<C> =
        Arc::new(move |ctx: C, next: Next<C>| -> BoxFuture<'static, ComposeResult<()>> {
            Box::pin(func(ctx, next))
        });
    Middleware::Fn(erased)
}

/// Continuation handed to every middleware invocation.
///
/// Calling [`Next::run`] resumes the rest of the chain with the new context
/// and resolves once everything downstream has settled. Each continuation may
/// fire at most once; a second call fails with
/// [`ComposeError::ContinuationReused`](crate::errors::ComposeError::ContinuationReused).
/// Not calling it at all is a legal short-circuit.
pub struct Next<C> {
    resume: Arc<dyn Fn(C) -> BoxFuture<'static, ComposeResult<()>> + Send + Sync>,
}

impl<C> Next<C> {
    pub fn new<F>(resume: F) -> Self
    where
        F: Fn(C) -> BoxFuture<'static, ComposeResult<()>> + Send + Sync + 'static,
    {
        Self {
            resume: Arc::new(resume),
        }
    }

    /// Resume the chain with `ctx`.
    ///
    /// The reuse check happens at call time, not on first poll.
    pub fn run(&self, ctx: C) -> BoxFuture<'static, ComposeResult<()>> {
        (self.resume)(ctx)
    }
}

impl<C> Clone for Next<C> {
    fn clone(&self) -> Self {
        Self {
            resume: Arc::clone(&self.resume),
        }
    }
}

impl<C> fmt::Debug for Next<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Next")
    }
}

/// Ordered list of middleware, the argument type of every combinator.
///
/// Converts from one middleware, a `Vec`, an array, or a composer.
pub struct Chain<C>(pub Vec<Middleware<C>>);

impl<C> Chain<C> {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, middleware: Middleware<C>) {
        self.0.push(middleware);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Middleware<C>> {
        self.0.iter()
    }
}

impl<C> Default for Chain<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> Clone for Chain<C> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<C> fmt::Debug for Chain<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Chain").field(&self.0).finish()
    }
}

impl<C> From<Middleware<C>> for Chain<C> {
    fn from(middleware: Middleware<C>) -> Self {
        Self(vec![middleware])
    }
}

impl<C> From<Vec<Middleware<C>>> for Chain<C> {
    fn from(middleware: Vec<Middleware<C>>) -> Self {
        Self(middleware)
    }
}

impl<C, const N: usize> From<[Middleware<C>; N]> for Chain<C> {
    fn from(middleware: [Middleware<C>; N]) -> Self {
        Self(middleware.into())
    }
}

impl<C> From<MiddlewareFn<C>> for Chain<C> {
    fn from(func: MiddlewareFn<C>) -> Self {
        Self(vec![Middleware::Fn(func)])
    }
}

impl<C> IntoIterator for Chain<C> {
    type Item = Middleware<C>;
    type IntoIter = std::vec::IntoIter<Middleware<C>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<C> FromIterator<Middleware<C>> for Chain<C> {
    fn from_iter<I: IntoIterator<Item = Middleware<C>>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
