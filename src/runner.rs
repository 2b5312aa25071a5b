//! The unit all higher-level operations call through: one tool invocation
//! with a single heal-and-retry on a missing binary, plus ordered fallback
//! chains.
//!
//! This is the only retry point in the core, and it is capped at one retry
//! per call — no backoff, no loop.

use tracing::debug;

use crate::heal::{DependencyHealer, Remediation};
use crate::invoke::{InvokeError, OutputValidator, ToolInvoker, accept_any};

/// One step of an ordered fallback chain.
pub struct ChainStep<'a> {
    /// Step label, used in logs and outcome mapping.
    pub label: &'static str,
    /// The work of this step; usually one or more runner calls.
    pub run: Box<dyn Fn() -> Result<String, InvokeError> + Send + Sync + 'a>,
}

impl<'a> ChainStep<'a> {
    /// Create a chain step from a closure.
    pub fn new(
        label: &'static str,
        run: impl Fn() -> Result<String, InvokeError> + Send + Sync + 'a,
    ) -> Self {
        Self {
            label,
            run: Box::new(run),
        }
    }
}

/// The step a fallback chain stopped at, with its result.
#[derive(Debug)]
pub struct ChainOutcome {
    /// Label of the step that produced the result.
    pub step: &'static str,
    /// The step's result. `Err(ToolMissing)` only when every step was
    /// missing its tool (the last one is reported).
    pub result: Result<String, InvokeError>,
}

/// Composes the process invoker with the dependency healer.
pub struct CommandRunner {
    invoker: Box<dyn ToolInvoker>,
    healer: DependencyHealer,
}

impl CommandRunner {
    /// Create a runner from an invoker and a healer.
    pub fn new(invoker: Box<dyn ToolInvoker>, healer: DependencyHealer) -> Self {
        Self { invoker, healer }
    }

    /// Run one tool with the default accept-anything validator.
    ///
    /// # Errors
    ///
    /// See [`CommandRunner::run_validated`].
    pub fn run(&self, program: &str, args: &[&str]) -> Result<String, InvokeError> {
        self.run_validated(program, args, accept_any)
    }

    /// Run one tool, validating its stdout.
    ///
    /// On `ToolMissing` the healer is consulted exactly once; if it
    /// remediates, the invocation is repeated exactly once and that result
    /// is returned. Otherwise the original failure propagates.
    ///
    /// # Errors
    ///
    /// Propagates [`InvokeError`] from the invocation.
    pub fn run_validated(
        &self,
        program: &str,
        args: &[&str],
        is_valid: OutputValidator,
    ) -> Result<String, InvokeError> {
        match self.invoker.invoke(program, args, is_valid) {
            Err(InvokeError::ToolMissing { tool }) => {
                match self.healer.attempt(self.invoker.as_ref(), &tool) {
                    Remediation::Remediated => self.invoker.invoke(program, args, is_valid),
                    Remediation::NotRemediated => Err(InvokeError::ToolMissing { tool }),
                }
            }
            other => other,
        }
    }

    /// Evaluate an ordered fallback chain, stopping at the first step whose
    /// result is anything other than `ToolMissing`.
    ///
    /// The chain order is data: callers declare their alternatives up front
    /// instead of nesting catch-and-retry control flow.
    pub fn run_chain(&self, steps: &[ChainStep<'_>]) -> ChainOutcome {
        debug_assert!(!steps.is_empty(), "fallback chain must have steps");

        let mut last_missing: Option<ChainOutcome> = None;
        for step in steps {
            match (step.run)() {
                Err(InvokeError::ToolMissing { tool }) => {
                    debug!(
                        "fallback: `{tool}` missing, advancing past step `{}`",
                        step.label
                    );
                    last_missing = Some(ChainOutcome {
                        step: step.label,
                        result: Err(InvokeError::ToolMissing { tool }),
                    });
                }
                result => {
                    return ChainOutcome {
                        step: step.label,
                        result,
                    };
                }
            }
        }

        last_missing.unwrap_or(ChainOutcome {
            step: "empty-chain",
            result: Ok(String::new()),
        })
    }
}
