// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod runner;
pub mod sequencer;

pub use runner::{run, Settled};
pub use sequencer::{concat, flatten, fold, pass};
