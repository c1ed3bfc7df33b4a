// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire protocols for the Clerk kernel.
//!
//! Two newline-delimited JSON protocols share this crate: the front-end
//! envelope (UI process ↔ kernel) and the worker protocol (kernel ↔
//! supervised subprocesses). One JSON document per line, UTF-8, no framing
//! beyond the newline.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod codec;
mod frontend;
mod worker;

pub use codec::{read_json_line, write_json_line, WireError, MAX_LINE_BYTES};
pub use frontend::{Request, Response, ResponseError};
pub use worker::{ReadyAnnouncement, WorkerCommand, WorkerLine, WorkerReply, WorkerReplyError};
