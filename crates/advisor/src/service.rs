// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The one public surface of the advisory subsystem.
//!
//! Every suggestion and draft passes through the Guardrail here: `block`
//! removes the item, `flag` annotates it, `allow` passes it through. Each
//! computed item and each guardrail verdict is audited, fail-soft.

use std::collections::HashMap;
use std::sync::Arc;

use clerk_core::{Clock, ErrorCode, Fault, SystemClock};
use clerk_storage::Store;
use clerk_workflow::WorkflowRegistry;
use serde_json::Value;
use tracing::debug;

use crate::advisor;
use crate::draft::{build_content, Draft, DraftKind};
use crate::guardrail::{Guardrail, GuardrailDecision};
use crate::suggestion::Suggestion;

pub struct AdvisorService<C: Clock = SystemClock> {
    store: Arc<Store>,
    registry: Arc<WorkflowRegistry>,
    guardrail: Guardrail,
    clock: C,
}

impl<C: Clock> AdvisorService<C> {
    pub fn new(
        store: Arc<Store>,
        registry: Arc<WorkflowRegistry>,
        guardrail: Guardrail,
        clock: C,
    ) -> Self {
        Self { store, registry, guardrail, clock }
    }

    /// Compute, screen, and audit suggestions. `context` narrows the
    /// result to one context string (e.g. `workflow:invoice-export`).
    pub fn suggestions(&self, context: Option<&str>) -> Vec<Suggestion> {
        let now = self.clock.epoch_ms();
        let computed = advisor::analyze(&self.store, &self.registry, now);

        let mut per_context: HashMap<String, usize> = HashMap::new();
        let mut screened = Vec::new();
        for suggestion in computed {
            if let Some(wanted) = context {
                if suggestion.context != wanted {
                    continue;
                }
            }
            self.store.audit_suggestion(
                suggestion.id.as_str(),
                suggestion.suggestion_type.as_str(),
                &suggestion.context,
                &suggestion.title,
                suggestion.confidence,
                suggestion.level.as_str(),
                now,
            );
            let decision = self.guardrail.evaluate(&suggestion);
            self.store.audit_guardrail(
                suggestion.id.as_str(),
                decision.as_str(),
                decision.reason(),
                now,
            );
            match decision {
                GuardrailDecision::Block { reason } => {
                    debug!(suggestion = %suggestion.id, reason, "suggestion blocked by guardrail");
                }
                GuardrailDecision::Flag { reason } => {
                    let mut flagged = suggestion;
                    flagged.flag = Some(reason);
                    screened.push(flagged);
                }
                GuardrailDecision::Allow => screened.push(suggestion),
            }
        }

        // Context cap, in computed order.
        screened.retain(|s| {
            let count = per_context.entry(s.context.clone()).or_insert(0);
            *count += 1;
            *count <= self.guardrail.max_per_context()
        });
        screened
    }

    /// Generate a draft artifact of `kind`. A guardrail `block` surfaces
    /// as `POLICY_BLOCKED`; the draft never leaves the kernel.
    pub fn generate_draft(&self, kind: DraftKind, params: &Value) -> Result<Draft, Fault> {
        let now = self.clock.epoch_ms();
        let decision = self.guardrail.evaluate_draft(kind);
        let mut draft = Draft::new(kind, build_content(kind, params));
        self.store.audit_guardrail(draft.id.as_str(), decision.as_str(), decision.reason(), now);
        match decision {
            GuardrailDecision::Block { reason } => {
                // Audit the attempt; nothing is returned.
                self.store.audit_draft(draft.id.as_str(), kind.as_str(), &draft.content_hash, now);
                Err(Fault::new(ErrorCode::PolicyBlocked, reason))
            }
            GuardrailDecision::Flag { reason } => {
                draft.flag = Some(reason);
                self.store.audit_draft(draft.id.as_str(), kind.as_str(), &draft.content_hash, now);
                Ok(draft)
            }
            GuardrailDecision::Allow => {
                self.store.audit_draft(draft.id.as_str(), kind.as_str(), &draft.content_hash, now);
                Ok(draft)
            }
        }
    }
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;
