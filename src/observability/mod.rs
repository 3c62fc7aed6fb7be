// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Observability module for structured logging and tracing.
//!
//! Every diagnostic the engine emits is a message struct with a `Display`
//! impl, so wording lives in one place instead of being scattered through the
//! sequencing code as string literals.
//!
//! Messages are organized by subsystem:
//! * `messages::engine` - execution lifecycle and protocol violations
//! * `messages::dispatch` - fork joins and dynamic sub-chain selection
//!
//! The library never installs a subscriber; hosts decide where events go.
//!
//! # Usage
//!
//! ```rust
//! use the_layercake::observability::messages::{engine::ExecutionFailed, StructuredLog};
//! use std::time::Duration;
//!
//! let error = std::io::Error::new(std::io::ErrorKind::Other, "test error");
//! ExecutionFailed {
//!     error: &error,
//!     duration: Duration::from_millis(3),
//! }
//! .log();
//! ```

pub mod messages;
