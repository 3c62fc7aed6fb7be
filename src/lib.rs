// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod composer;      // builder + combinators
pub mod engine;        // sequencer and runner
pub mod errors;        // error handling
pub mod observability;
pub mod traits;        // middleware shapes and dispatch seams

pub use composer::Composer;
pub use engine::Settled;
pub use errors::{ComposeError, ComposeResult};
pub use traits::{from_fn, Chain, Middleware, MiddlewareFn, Next};
