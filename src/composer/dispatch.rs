// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Predicate-driven dispatch: `lazy`, `branch`, `filter` and `narrow`.
//!
//! `lazy` is the primitive. It asks a factory for a chain on every invocation,
//! runs that chain to completion against the incoming context, and feeds the
//! result to the outer continuation. `branch` is a lazy step whose factory
//! evaluates a predicate and returns one of two prebuilt chains; `filter` is a
//! branch whose false side passes the context through.

use async_trait::async_trait;
use std::sync::Arc;

use crate::composer::Composer;
use crate::engine::{run, Settled};
use crate::errors::ComposeResult;
use crate::observability::messages::dispatch::{BranchSelected, LazyChainResolved};
use crate::observability::messages::StructuredLog;
use crate::traits::{from_fn, Chain, Middleware, MiddlewareFactory, MiddlewareFn, Next, Predicate};

impl<C> Composer<C>
where
    C: Send + Sync + 'static,
{
    /// Decide per invocation which middleware to run.
    ///
    /// `factory` is called exactly once per invocation with the incoming
    /// context. The chain it returns runs to completion against that context
    /// and the resulting context continues down this chain. If the produced
    /// chain short-circuits, so does this one.
    ///
    /// ```
    /// use the_layercake::composer::Composer;
    /// use the_layercake::traits::{from_fn, Middleware, Next};
    ///
    /// #[derive(Debug, PartialEq)]
    /// struct Ctx { n: u32, m: &'static str }
    ///
    /// fn tag(m: &'static str) -> Middleware<Ctx> {
    ///     from_fn(move |ctx: Ctx, next: Next<Ctx>| next.run(Ctx { m, ..ctx }))
    /// }
    ///
    /// # tokio::runtime::Runtime::new().unwrap().block_on(async {
    /// let mut app: Composer<Ctx> = Composer::new();
    /// app.lazy(|ctx: &Ctx| if ctx.n % 2 == 1 { tag("odd") } else { tag("even") });
    ///
    /// assert_eq!(app.execute(Ctx { n: 1, m: "" }).await.unwrap().m, "odd");
    /// assert_eq!(app.execute(Ctx { n: 2, m: "" }).await.unwrap().m, "even");
    /// # });
    /// ```
    pub fn lazy<F>(&mut self, factory: F) -> Composer<C>
    where
        F: MiddlewareFactory<C> + 'static,
    {
        let factory = Arc::new(factory);
        self.with(from_fn(move |ctx: C, next: Next<C>| {
            lazy_step(Arc::clone(&factory), ctx, next)
        }))
    }

    /// Run `on_true` when `predicate` holds for the context, `on_false`
    /// otherwise.
    ///
    /// The predicate is evaluated once per invocation and exactly one side
    /// runs.
    pub fn branch<P>(
        &mut self,
        predicate: P,
        on_true: impl Into<Chain<C>>,
        on_false: impl Into<Chain<C>>,
    ) -> Composer<C>
    where
        P: Predicate<C> + 'static,
    {
        self.lazy(Selector {
            combinator: "branch",
            predicate,
            on_true: on_true.into(),
            on_false: on_false.into(),
        })
    }

    /// Run `middleware` only when `predicate` holds; otherwise the context
    /// passes through unchanged.
    ///
    /// Returns the child composer holding `middleware`, so further
    /// registrations on it stay behind the same predicate.
    pub fn filter<P>(&mut self, predicate: P, middleware: impl Into<Chain<C>>) -> Composer<C>
    where
        P: Predicate<C> + 'static,
    {
        let child = Composer::from_chain(middleware);
        self.lazy(Selector {
            combinator: "filter",
            predicate,
            on_true: Chain::from(Middleware::Fn(child.attached())),
            on_false: Chain::new(),
        });
        child
    }

    /// Run `middleware` on a narrower context type when the incoming context
    /// converts to it.
    ///
    /// `D::try_from` is the predicate: on success the chain runs on the `D`
    /// value and its result widens back through `C::from`; on failure the
    /// original context comes back as the error and passes through unchanged.
    pub fn narrow<D>(&mut self, middleware: impl Into<Chain<D>>) -> Composer<D>
    where
        D: TryFrom<C, Error = C> + Send + Sync + 'static,
        C: From<D>,
    {
        let child = Composer::<D>::from_chain(middleware);
        let narrowed = child.attached();
        self.with(from_fn(move |ctx: C, next: Next<C>| {
            narrow_step(Arc::clone(&narrowed), ctx, next)
        }));
        child
    }
}

async fn lazy_step<C, F>(factory: Arc<F>, ctx: C, next: Next<C>) -> ComposeResult<()>
where
    C: Send + Sync + 'static,
    F: MiddlewareFactory<C>,
{
    let chain = factory.create(&ctx).await?;
    LazyChainResolved {
        middleware_count: chain.len(),
    }
    .log();

    let composed = chain.compose();
    match run(ctx, &composed).await? {
        Settled::Completed(new_ctx) => next.run(new_ctx).await,
        Settled::Halted => Ok(()),
    }
}

async fn narrow_step<C, D>(narrowed: MiddlewareFn<D>, ctx: C, next: Next<C>) -> ComposeResult<()>
where
    C: From<D> + Send + 'static,
    D: TryFrom<C, Error = C> + Send + 'static,
{
    let matched = D::try_from(ctx);
    BranchSelected {
        combinator: "narrow",
        matched: matched.is_ok(),
    }
    .log();

    match matched {
        Ok(narrow_ctx) => match run(narrow_ctx, &narrowed).await? {
            Settled::Completed(narrow_ctx) => next.run(C::from(narrow_ctx)).await,
            Settled::Halted => Ok(()),
        },
        Err(ctx) => next.run(ctx).await,
    }
}

/// Factory behind `branch` and `filter`: picks one of two prebuilt chains.
struct Selector<P, C> {
    combinator: &'static str,
    predicate: P,
    on_true: Chain<C>,
    on_false: Chain<C>,
}

#[async_trait]
impl<P, C> MiddlewareFactory<C> for Selector<P, C>
where
    P: Predicate<C>,
    C: Send + Sync + 'static,
{
    async fn create(&self, ctx: &C) -> ComposeResult<Chain<C>> {
        let matched = self.predicate.test(ctx).await?;
        BranchSelected {
            combinator: self.combinator,
            matched,
        }
        .log();

        Ok(if matched {
            self.on_true.clone()
        } else {
            self.on_false.clone()
        })
    }
}
