// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The composer: a builder that grows a middleware tree and runs it.
//!
//! A composer owns three slots, each starting as the identity step:
//!
//! 1. the **before** stage, grown by [`Composer::before`]
//! 2. the **main** handler, grown by [`Composer::with`] and every combinator
//!    built on it
//! 3. the **after** stage, grown by [`Composer::after`]
//!
//! Execution always folds them in that order, so a `before` registered last
//! still runs ahead of every main step, and an `after` registered first still
//! observes the context every main step produced.
//!
//! Every combinator except `after` returns the child composer it created for
//! the middleware it was given. The parent refers to the child's slots rather
//! than to a snapshot of them, so anything registered on the child later is
//! part of the parent's chain from the next invocation on.
//! [`Composer::middleware`] is different: it exports a snapshot of the
//! current handler.
//!
//! Every step nests one more future inside the previous one, so a single
//! composer holding many hundreds of middleware can exhaust the thread's
//! stack when it runs (a debug build overflows the default 2 MiB test thread
//! somewhere between 500 and 1000 `with` calls). A `lazy` sub-chain settles
//! before the outer chain resumes, so splitting a long pipeline into `lazy`
//! segments bounds the depth; otherwise drive it from a thread built with a
//! larger stack.
//!
//! ```
//! use the_layercake::composer::Composer;
//! use the_layercake::traits::{from_fn, Middleware, Next};
//!
//! fn add(step: u32) -> Middleware<Vec<u32>> {
//!     from_fn(move |mut steps: Vec<u32>, next: Next<Vec<u32>>| {
//!         steps.push(step);
//!         next.run(steps)
//!     })
//! }
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let mut app: Composer<Vec<u32>> = Composer::new();
//! app.with(add(3));
//! app.before(add(1));
//! app.before(add(2));
//!
//! assert_eq!(app.execute(Vec::new()).await.unwrap(), vec![1, 2, 3]);
//! # });
//! ```

mod dispatch;

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};
use std::time::Instant;

use tracing::Instrument;

use crate::engine::{concat, fold, pass, run, Settled};
use crate::errors::ComposeResult;
use crate::observability::messages::dispatch::ForkJoined;
use crate::observability::messages::engine::{
    ExecutionCompleted, ExecutionFailed, ExecutionHalted, ExecutionStarted,
};
use crate::observability::messages::StructuredLog;
use crate::traits::{from_fn, Chain, Middleware, MiddlewareFn, MiddlewareProvider, Next};

/// Builder and runner for a middleware tree over context type `C`.
///
/// Not `Clone`: each handle is the single writer of its own slots.
pub struct Composer<C> {
    stages: Arc<RwLock<Stages<C>>>,
}

struct Stages<C> {
    before: MiddlewareFn<C>,
    handler: MiddlewareFn<C>,
    after: MiddlewareFn<C>,
    registrations: Registrations,
}

#[derive(Debug, Clone, Copy, Default)]
struct Registrations {
    before: usize,
    main: usize,
    after: usize,
}

impl<C> Stages<C>
where
    C: Send + 'static,
{
    fn effective(&self) -> MiddlewareFn<C> {
        fold([
            Arc::clone(&self.before),
            Arc::clone(&self.handler),
            Arc::clone(&self.after),
        ])
    }
}

impl<C> Composer<C>
where
    C: Send + Sync + 'static,
{
    /// An empty composer; executing it hands back the context untouched.
    pub fn new() -> Self {
        Self::from_stages(pass(), 0)
    }

    /// A composer whose main handler starts as `middleware`, in order.
    pub fn from_chain(middleware: impl Into<Chain<C>>) -> Self {
        let chain = middleware.into();
        let seeded = if chain.is_empty() { 0 } else { 1 };
        Self::from_stages(chain.compose(), seeded)
    }

    fn from_stages(handler: MiddlewareFn<C>, seeded: usize) -> Self {
        Self {
            stages: Arc::new(RwLock::new(Stages {
                before: pass(),
                handler,
                after: pass(),
                registrations: Registrations {
                    main: seeded,
                    ..Registrations::default()
                },
            })),
        }
    }

    /// Append `middleware` to the main handler.
    ///
    /// Returns the child composer holding exactly `middleware`; anything
    /// registered on it runs in its place in this chain.
    pub fn with(&mut self, middleware: impl Into<Chain<C>>) -> Composer<C> {
        let child = Composer::from_chain(middleware);
        let installed = child.attached();
        self.update(|stages| {
            stages.handler = concat(Arc::clone(&stages.handler), installed);
            stages.registrations.main += 1;
        });
        child
    }

    /// Prepend `middleware` ahead of the main handler.
    ///
    /// Repeated calls run in call order, and all of them run before the main
    /// handler no matter how they interleave with [`Composer::with`].
    pub fn before(&mut self, middleware: impl Into<Chain<C>>) -> Composer<C> {
        let child = Composer::from_chain(middleware);
        let installed = child.attached();
        self.update(|stages| {
            stages.before = concat(Arc::clone(&stages.before), installed);
            stages.registrations.before += 1;
        });
        child
    }

    /// Append `middleware` after the main handler.
    ///
    /// Repeated calls run in call order, and all of them observe the context
    /// the whole main handler produced.
    pub fn after(&mut self, middleware: impl Into<Chain<C>>) {
        let installed = middleware.into().compose();
        self.update(|stages| {
            stages.after = concat(Arc::clone(&stages.after), installed);
            stages.registrations.after += 1;
        });
    }

    /// Run `middleware` concurrently with the rest of the chain.
    ///
    /// When the chain reaches this point, the downstream continuation and a
    /// fresh run of `middleware` start together on the same context snapshot.
    /// The step settles once both have, and fails if either failed (the
    /// downstream error wins when both do). A forked branch that
    /// short-circuits counts as settled.
    pub fn fork(&mut self, middleware: impl Into<Chain<C>>) -> Composer<C>
    where
        C: Clone,
    {
        let child = Composer::from_chain(middleware);
        let branch = child.attached();
        self.with(from_fn(move |ctx: C, next: Next<C>| {
            fork_step(Arc::clone(&branch), ctx, next)
        }));
        child
    }

    /// Export the current effective handler as one middleware.
    ///
    /// The export is a snapshot: registrations made on this composer
    /// afterwards are not part of it, so a composer can embed its own export.
    pub fn middleware(&self) -> MiddlewareFn<C> {
        read(&self.stages).effective()
    }

    // Unlike `middleware`, folds whatever the slots hold on each invocation.
    // Parents install their children this way.
    fn attached(&self) -> MiddlewareFn<C> {
        let stages = Arc::clone(&self.stages);
        Arc::new(move |ctx: C, next: Next<C>| {
            let effective = read(&stages).effective();
            effective(ctx, next)
        })
    }

    /// Run the whole chain once and return the final context.
    ///
    /// If a middleware short-circuits, the returned future never resolves.
    /// Use [`Composer::execute_settled`] to observe that case instead.
    pub async fn execute(&self, ctx: C) -> ComposeResult<C> {
        match self.execute_settled(ctx).await? {
            Settled::Completed(ctx) => Ok(ctx),
            Settled::Halted => std::future::pending().await,
        }
    }

    /// Run the whole chain once, reporting a short-circuit as
    /// [`Settled::Halted`].
    pub async fn execute_settled(&self, ctx: C) -> ComposeResult<Settled<C>> {
        let (effective, registrations) = {
            let stages = read(&self.stages);
            (stages.effective(), stages.registrations)
        };

        let started = ExecutionStarted {
            before_stage: registrations.before,
            main_stage: registrations.main,
            after_stage: registrations.after,
        };
        let span = started.span("composer");

        async move {
            started.log();
            let start_time = Instant::now();
            let outcome = run(ctx, &effective).await;
            let duration = start_time.elapsed();

            match &outcome {
                Ok(Settled::Completed(_)) => ExecutionCompleted { duration }.log(),
                Ok(Settled::Halted) => ExecutionHalted { duration }.log(),
                Err(error) => ExecutionFailed { error, duration }.log(),
            }
            outcome
        }
        .instrument(span)
        .await
    }

    fn update(&self, apply: impl FnOnce(&mut Stages<C>)) {
        let mut stages = self.stages.write().unwrap_or_else(PoisonError::into_inner);
        apply(&mut stages);
    }
}

async fn fork_step<C>(branch: MiddlewareFn<C>, ctx: C, next: Next<C>) -> ComposeResult<()>
where
    C: Clone + Send + 'static,
{
    let snapshot = ctx.clone();
    let (main, forked) = tokio::join!(next.run(ctx), run(snapshot, &branch));

    ForkJoined {
        main_succeeded: main.is_ok(),
        fork_succeeded: forked.is_ok(),
    }
    .log();
    main.and(forked.map(|_| ()))
}

// Slots are only ever replaced whole, so a poisoned lock still holds a
// consistent value.
fn read<C>(stages: &RwLock<Stages<C>>) -> RwLockReadGuard<'_, Stages<C>> {
    stages.read().unwrap_or_else(PoisonError::into_inner)
}

impl<C> Default for Composer<C>
where
    C: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<C> fmt::Debug for Composer<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registrations = self
            .stages
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .registrations;
        f.debug_struct("Composer")
            .field("before_stage", &registrations.before)
            .field("main_stage", &registrations.main)
            .field("after_stage", &registrations.after)
            .finish()
    }
}

impl<C> MiddlewareProvider<C> for Composer<C>
where
    C: Send + Sync + 'static,
{
    fn middleware(&self) -> MiddlewareFn<C> {
        Composer::middleware(self)
    }
}

impl<C> From<Chain<C>> for Composer<C>
where
    C: Send + Sync + 'static,
{
    fn from(chain: Chain<C>) -> Self {
        Self::from_chain(chain)
    }
}

impl<C> From<Composer<C>> for Middleware<C>
where
    C: Send + Sync + 'static,
{
    fn from(composer: Composer<C>) -> Self {
        Middleware::provider(composer)
    }
}

impl<C> From<Composer<C>> for Chain<C>
where
    C: Send + Sync + 'static,
{
    fn from(composer: Composer<C>) -> Self {
        Chain::from(Middleware::from(composer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push(value: u32) -> Middleware<Vec<u32>> {
        from_fn(move |mut ctx: Vec<u32>, next: Next<Vec<u32>>| {
            ctx.push(value);
            next.run(ctx)
        })
    }

    #[tokio::test]
    async fn test_child_handle_stays_live() {
        let mut app: Composer<Vec<u32>> = Composer::new();
        let mut child = app.with(push(1));
        app.with(push(3));
        child.with(push(2));

        assert_eq!(app.execute(Vec::new()).await.unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_child_stages_stay_scoped() {
        let mut app: Composer<Vec<u32>> = Composer::new();
        app.with(push(1));
        let mut child = app.with(push(3));
        child.before(push(2));
        child.after(push(4));
        app.with(push(5));

        assert_eq!(app.execute(Vec::new()).await.unwrap(), vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_before_returns_live_child() {
        let mut app: Composer<Vec<u32>> = Composer::new();
        app.with(push(3));
        let mut early = app.before(push(1));
        early.with(push(2));

        assert_eq!(app.execute(Vec::new()).await.unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_composer_embeds_as_middleware() {
        let mut inner: Composer<Vec<u32>> = Composer::new();
        inner.with(push(2));
        inner.before(push(1));

        let mut outer: Composer<Vec<u32>> = Composer::new();
        outer.with(inner);
        outer.with(push(3));

        assert_eq!(outer.execute(Vec::new()).await.unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_exported_middleware_runs_in_another_composer() {
        let mut inner: Composer<Vec<u32>> = Composer::new();
        inner.with(push(7));

        let outer = Composer::from_chain(inner.middleware());
        assert_eq!(outer.execute(vec![6]).await.unwrap(), vec![6, 7]);
    }

    #[tokio::test]
    async fn test_export_is_a_snapshot() {
        let mut app: Composer<Vec<u32>> = Composer::new();
        app.with(push(1));
        let exported = app.middleware();
        app.with(push(2));

        let replay = Composer::from_chain(exported);
        assert_eq!(replay.execute(Vec::new()).await.unwrap(), vec![1]);
        assert_eq!(app.execute(Vec::new()).await.unwrap(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_composer_embeds_its_own_export() {
        let mut app: Composer<Vec<u32>> = Composer::new();
        app.with(push(1));
        app.with(push(2));
        let exported = app.middleware();
        app.with(exported);

        assert_eq!(app.execute(Vec::new()).await.unwrap(), vec![1, 2, 1, 2]);
    }

    #[tokio::test]
    async fn test_with_accepts_incrementally_built_chain() {
        let mut chain = Chain::new();
        for value in 1..=3 {
            chain.push(push(value));
        }

        let mut app: Composer<Vec<u32>> = Composer::new();
        app.with(chain);
        assert_eq!(app.execute(Vec::new()).await.unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_execute_settled_reports_completion() {
        let mut app: Composer<Vec<u32>> = Composer::new();
        app.with(push(1));

        let settled = app.execute_settled(Vec::new()).await.unwrap();
        assert_eq!(settled, Settled::Completed(vec![1]));
    }

    #[test]
    fn test_debug_counts_registrations() {
        let mut app: Composer<Vec<u32>> = Composer::from_chain(push(1));
        app.with(push(2));
        app.before(push(0));
        app.after(push(3));
        app.after(push(4));

        assert_eq!(
            format!("{:?}", app),
            "Composer { before_stage: 1, main_stage: 2, after_stage: 2 }"
        );
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        Message(String),
        Ping,
    }

    #[derive(Debug)]
    struct Message(String);

    impl TryFrom<Event> for Message {
        type Error = Event;

        fn try_from(event: Event) -> Result<Self, Event> {
            match event {
                Event::Message(text) => Ok(Message(text)),
                other => Err(other),
            }
        }
    }

    impl From<Message> for Event {
        fn from(message: Message) -> Self {
            Event::Message(message.0)
        }
    }

    #[tokio::test]
    async fn test_narrow_runs_on_matching_context_only() {
        let mut app: Composer<Event> = Composer::new();
        app.narrow::<Message>(from_fn(|message: Message, next: Next<Message>| {
            next.run(Message(message.0.to_uppercase()))
        }));

        let shouted = app.execute(Event::Message("hi".into())).await.unwrap();
        let ping = app.execute(Event::Ping).await.unwrap();

        assert_eq!(shouted, Event::Message("HI".into()));
        assert_eq!(ping, Event::Ping);
    }

    #[tokio::test]
    async fn test_narrowed_child_accepts_more_middleware() {
        let mut app: Composer<Event> = Composer::new();
        let mut messages = app.narrow::<Message>(Chain::new());
        messages.with(from_fn(|message: Message, next: Next<Message>| {
            next.run(Message(format!("{}!", message.0)))
        }));

        let result = app.execute(Event::Message("hey".into())).await.unwrap();
        assert_eq!(result, Event::Message("hey!".into()));
    }
}
