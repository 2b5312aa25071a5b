//! Shared test utilities used across multiple test modules.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::invoke::{InvokeError, OutputValidator, ToolInvoker, render_command};

/// Scripted tool invoker: per-program response queues plus call recording.
///
/// Applies the caller's validator to scripted `Ok` outputs, mirroring the
/// real invoker's semantics, so orchestration code under test sees the same
/// failure kinds it would see against live tools. Clones share state, so a
/// test can keep a handle while the runner owns a boxed clone.
#[derive(Clone, Default)]
pub struct ScriptedInvoker {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    responses: Mutex<HashMap<String, Vec<Result<String, InvokeError>>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for the next invocation of `program`. Programs with
    /// an empty queue respond with `Ok("")`.
    pub fn expect(&self, program: &str, result: Result<String, InvokeError>) {
        self.inner
            .responses
            .lock()
            .expect("responses lock")
            .entry(program.to_owned())
            .or_default()
            .push(result);
    }

    /// Shorthand for queueing a `ToolMissing` response.
    pub fn expect_missing(&self, program: &str) {
        self.expect(
            program,
            Err(InvokeError::ToolMissing {
                tool: program.to_owned(),
            }),
        );
    }

    /// Every rendered command line invoked so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.inner.calls.lock().expect("calls lock").clone()
    }

    /// Number of invocations of `program` so far.
    pub fn calls_to(&self, program: &str) -> usize {
        self.inner
            .calls
            .lock()
            .expect("calls lock")
            .iter()
            .filter(|c| *c == program || c.starts_with(&format!("{program} ")))
            .count()
    }
}

impl ToolInvoker for ScriptedInvoker {
    fn invoke(
        &self,
        program: &str,
        args: &[&str],
        is_valid: OutputValidator,
    ) -> Result<String, InvokeError> {
        let command = render_command(program, args);
        self.inner
            .calls
            .lock()
            .expect("calls lock")
            .push(command.clone());

        let scripted = {
            let mut responses = self.inner.responses.lock().expect("responses lock");
            responses.get_mut(program).and_then(|queue| {
                if queue.is_empty() {
                    None
                } else {
                    Some(queue.remove(0))
                }
            })
        };

        match scripted.unwrap_or_else(|| Ok(String::new())) {
            Ok(output) => {
                if is_valid(&output) {
                    Ok(output)
                } else {
                    Err(InvokeError::ValidationRejected { command, output })
                }
            }
            Err(e) => Err(e),
        }
    }
}
