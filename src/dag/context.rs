//! The execution context (`spec.md` §4.3.4, §9): a scoped resource
//! wrapping a single `prepare()`/`execute()` call, responsible for the
//! block's state transitions and for translating faults into the
//! right `FlowError` kind.
//!
//! The context is a strategy object, not a base class to inherit
//! from — a GUI layer can install a richer context (progress bars,
//! timing) at `Dag` construction without touching the executor's
//! control flow.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::block::{Block, BlockState};
use crate::error::FlowError;
use crate::log;

/// Runs around one `prepare()`/`execute()` invocation.
pub trait ExecutionContext: Send {
    fn enter(&mut self, block: &mut dyn Block);

    /// `outcome` is the `Result` of calling `prepare()`/`execute()`.
    /// Returns the error the executor should propagate, if any.
    fn exit(
        &mut self,
        block: &mut dyn Block,
        cancelled: &AtomicBool,
        outcome: Result<(), FlowError>,
    ) -> Result<(), FlowError>;
}

/// The engine's built-in context: no GUI, no progress bar, just state
/// transitions, logging, and fault classification per §4.3.4.
pub struct DefaultContext {
    started: Option<Instant>,
}

impl Default for DefaultContext {
    fn default() -> Self {
        Self { started: None }
    }
}

impl ExecutionContext for DefaultContext {
    fn enter(&mut self, block: &mut dyn Block) {
        self.started = Some(Instant::now());
        block.base_mut().set_state(BlockState::Executing);
        log::info(format!("[{}] EXECUTING", block.name()));
    }

    fn exit(
        &mut self,
        block: &mut dyn Block,
        cancelled: &AtomicBool,
        outcome: Result<(), FlowError>,
    ) -> Result<(), FlowError> {
        let elapsed = self
            .started
            .take()
            .map(|t| t.elapsed())
            .unwrap_or_default();

        match outcome {
            Ok(()) => {
                let state = if block.wait_for_input() {
                    BlockState::Waiting
                } else {
                    BlockState::Successful
                };
                block.base_mut().set_state(state);
                log::info(format!(
                    "[{}] {state} ({:.3}s)",
                    block.name(),
                    elapsed.as_secs_f64()
                ));
                Ok(())
            }
            Err(FlowError::Cancelled) => {
                // A block that cooperatively noticed cancellation (e.g.
                // via `Dag::stopper()`, §4.3.5) and returned early.
                // This does not abort `execute()` with an error: it
                // sets the dag's cancellation flag so the executor
                // stops invoking further blocks, and the cancellation
                // itself is surfaced through the pause/none sentinel
                // and `Dag::is_stopped()` (`spec.md` §7).
                block.base_mut().set_state(BlockState::Interrupted);
                cancelled.store(true, Ordering::Release);
                log::info(format!("[{}] INTERRUPTED", block.name()));
                Ok(())
            }
            Err(FlowError::Validation { block: b, message }) => {
                // Validation faults stop this execution but leave the
                // dag usable: the cancellation flag is left untouched.
                block.base_mut().set_state(BlockState::Error);
                log::error(format!("[{}] ERROR (validation): {message}", block.name()));
                Err(FlowError::Validation { block: b, message })
            }
            Err(other) => {
                block.base_mut().set_state(BlockState::Error);
                cancelled.store(true, Ordering::Release);
                log::error(format!("[{}] ERROR: {other}", block.name()));
                Err(FlowError::Block {
                    block: block.name().to_string(),
                    source: Box::new(other),
                })
            }
        }
    }
}

pub fn default_context_factory() -> Arc<dyn Fn() -> Box<dyn ExecutionContext> + Send + Sync> {
    Arc::new(|| Box::new(DefaultContext::default()) as Box<dyn ExecutionContext>)
}
