// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The seam between the engine and the kernel's dispatch machinery.

use async_trait::async_trait;
use clerk_core::Fault;
use serde_json::Value;

/// Executes one task step's operation and returns its result.
///
/// The kernel implements this over Router + Supervisor; tests use
/// [`ScriptedRunner`]. Implementations own their deadlines and map worker
/// failures into [`Fault`]s.
#[async_trait]
pub trait StepRunner: Send + Sync + 'static {
    async fn run_operation(&self, operation: &str, input: &Value) -> Result<Value, Fault>;
}

#[cfg(any(test, feature = "test-support"))]
pub use scripted::ScriptedRunner;

#[cfg(any(test, feature = "test-support"))]
mod scripted {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::Arc;

    type Script = Box<dyn FnMut(&Value) -> Result<Value, Fault> + Send>;

    /// Test runner: scripted responses per operation, with a call journal.
    #[derive(Clone, Default)]
    pub struct ScriptedRunner {
        scripts: Arc<Mutex<HashMap<String, Script>>>,
        calls: Arc<Mutex<Vec<(String, Value)>>>,
    }

    impl ScriptedRunner {
        pub fn new() -> Self {
            Self::default()
        }

        /// Answer `operation` with a fixed result.
        pub fn answer(&self, operation: &str, result: Value) -> &Self {
            self.script(operation, move |_| Ok(result.clone()));
            self
        }

        /// Answer `operation` with a fixed fault.
        pub fn fail_with(&self, operation: &str, fault: Fault) -> &Self {
            self.script(operation, move |_| Err(fault.clone()));
            self
        }

        /// Script `operation` with a closure observing the resolved input.
        pub fn script(
            &self,
            operation: &str,
            f: impl FnMut(&Value) -> Result<Value, Fault> + Send + 'static,
        ) -> &Self {
            self.scripts.lock().insert(operation.to_string(), Box::new(f));
            self
        }

        /// `(operation, resolved input)` pairs in dispatch order.
        pub fn calls(&self) -> Vec<(String, Value)> {
            self.calls.lock().clone()
        }

        pub fn calls_for(&self, operation: &str) -> Vec<Value> {
            self.calls
                .lock()
                .iter()
                .filter(|(op, _)| op == operation)
                .map(|(_, input)| input.clone())
                .collect()
        }
    }

    #[async_trait]
    impl StepRunner for ScriptedRunner {
        async fn run_operation(&self, operation: &str, input: &Value) -> Result<Value, Fault> {
            self.calls.lock().push((operation.to_string(), input.clone()));
            let mut scripts = self.scripts.lock();
            match scripts.get_mut(operation) {
                Some(script) => script(input),
                None => Err(Fault::unknown_operation(operation)),
            }
        }
    }
}
