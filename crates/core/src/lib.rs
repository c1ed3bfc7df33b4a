// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Core types shared across the Clerk kernel: ids, clock, event bus,
//! error-code taxonomy, and the scrubbing/digest helpers used anywhere
//! request payloads touch a log or a persisted summary.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod bus;
pub mod clock;
pub mod digest;
pub mod error;
pub mod id;
pub mod scrub;

pub use bus::{EventBus, EventPump, SubscriptionId, WILDCARD_TOPIC};
pub use clock::{Clock, FakeClock, SystemClock};
pub use digest::digest_value;
pub use error::{ErrorCode, Fault};
pub use id::{CommandId, DraftId, ExecutionId, SuggestionId};
pub use scrub::{scrub_text, scrub_value};
