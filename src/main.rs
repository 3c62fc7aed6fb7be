// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::env;
use std::time::{Duration, Instant};

use the_layercake::traits::predicate_fn;
use the_layercake::{from_fn, ComposeResult, Composer, Middleware, Next};
use tracing_subscriber::EnvFilter;

const DEFAULT_DELAY_MS: u64 = 100;

/// Context threaded through the demo pipeline.
#[derive(Debug, Clone)]
struct Order {
    id: u32,
    started: Option<Instant>,
    lane: &'static str,
}

fn stamp_start() -> Middleware<Order> {
    from_fn(|order: Order, next: Next<Order>| {
        next.run(Order {
            started: Some(Instant::now()),
            ..order
        })
    })
}

fn simulate_work(delay: Duration) -> Middleware<Order> {
    from_fn(move |order: Order, next: Next<Order>| async move {
        tokio::time::sleep(delay).await;
        next.run(order).await
    })
}

fn lane(name: &'static str) -> Middleware<Order> {
    from_fn(move |order: Order, next: Next<Order>| next.run(Order { lane: name, ..order }))
}

fn audit(delay: Duration) -> Middleware<Order> {
    from_fn(move |order: Order, next: Next<Order>| async move {
        tokio::time::sleep(delay).await;
        tracing::info!(order_id = order.id, lane = order.lane, "audit trail written");
        next.run(order).await
    })
}

fn report_elapsed() -> Middleware<Order> {
    from_fn(|order: Order, next: Next<Order>| {
        let elapsed = order.started.map(|started| started.elapsed());
        tracing::info!(order_id = order.id, lane = order.lane, ?elapsed, "order processed");
        next.run(order)
    })
}

fn build_pipeline(delay: Duration) -> Composer<Order> {
    let mut pipeline = Composer::new();

    pipeline.before(stamp_start());
    pipeline.after(report_elapsed());

    // Runs alongside everything registered after it; joined before the
    // pipeline settles.
    pipeline.fork(audit(delay));
    pipeline.with(simulate_work(delay));
    pipeline.branch(
        |order: &Order| order.id % 2 == 0,
        lane("even"),
        lane("odd"),
    );
    pipeline.filter(
        predicate_fn(|order: &Order| {
            let id = order.id;
            async move { Ok(id > 100) }
        }),
        lane("priority"),
    );

    pipeline
}

#[tokio::main]
async fn main() -> ComposeResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let delay_ms = match env::args().nth(1) {
        Some(raw) => raw.parse::<u64>().unwrap_or_else(|_| {
            eprintln!("Usage: the-layercake [delay_ms]");
            std::process::exit(1);
        }),
        None => DEFAULT_DELAY_MS,
    };
    let pipeline = build_pipeline(Duration::from_millis(delay_ms));

    for id in [7, 42, 512] {
        let order = Order {
            id,
            started: None,
            lane: "unassigned",
        };
        let processed = pipeline.execute(order).await?;
        tracing::info!(
            order_id = processed.id,
            lane = processed.lane,
            "pipeline returned"
        );
    }

    Ok(())
}
