// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Advisory subsystem: Advisor, Guardrail, Draft.
//!
//! Strictly read-only over kernel state: the only writes these services
//! perform are their own audit rows. Every externally observable
//! suggestion or draft passes through the Guardrail; there is no public
//! path around it — [`AdvisorService`] is the single entry point.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod advisor;
mod draft;
mod guardrail;
mod service;
mod suggestion;

pub use draft::{Draft, DraftKind};
pub use guardrail::{Guardrail, GuardrailDecision, GuardrailPolicy};
pub use service::AdvisorService;
pub use suggestion::{ConfidenceLevel, Explanation, Limitations, Suggestion, SuggestionType};
