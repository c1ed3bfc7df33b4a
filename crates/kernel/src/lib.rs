// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Clerk orchestration kernel (`clerkd`).
//!
//! A single long-running coordinator: it supervises worker subprocesses
//! over line-delimited JSON stdio, validates and routes front-end
//! requests, schedules tasks, drives durable workflows, and screens
//! advisory output. The library surface exists for the workspace scenario
//! tests; the binary entry point is `main.rs`.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod dispatch;
pub mod env;
pub mod gateway;
pub mod lifecycle;
pub mod listener;
pub mod router;
pub mod scheduler;
pub mod state;
pub mod supervisor;

pub use gateway::Gateway;
pub use listener::KernelCtx;
pub use router::{route, Destination, Route};
pub use scheduler::{Scheduler, TaskDispatch};
pub use state::ConfigState;
pub use supervisor::Supervisor;
