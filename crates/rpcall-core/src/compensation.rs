// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Compensation registry for undoing partial side effects of a failed call.
//!
//! Dispatch code registers an action for each side effect it has already
//! applied. If the call ends in anything other than a result, the runner
//! executes every action in registration order. Each action runs inside its
//! own fault boundary: an `Err` or a panic is logged and recorded, and the
//! remaining actions still run.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use futures::future::BoxFuture;
use tracing::{debug, info, warn};
use uuid::Uuid;

type BoxedAction = Box<dyn FnOnce() -> BoxFuture<'static, anyhow::Result<()>> + Send>;

/// A unit of undo logic.
///
/// Actions own whatever they need to undo; they never see the call itself.
pub struct CompensationAction {
    action: BoxedAction,
}

impl CompensationAction {
    /// Wrap an async closure.
    pub fn new<F, Fut>(action: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self {
            action: Box::new(move || action().boxed()),
        }
    }

    /// Wrap a synchronous closure.
    pub fn from_fn<F>(action: F) -> Self
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        Self::new(move || async move { action() })
    }

    async fn execute(self) -> Result<(), String> {
        // The closure itself is called inside the boundary so a panic while
        // building the future is captured too.
        let action = self.action;
        let guarded = AssertUnwindSafe(async move { action().await }).catch_unwind();
        match guarded.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(format!("{err:#}")),
            Err(panic) => Err(panic_message(&*panic)),
        }
    }
}

impl fmt::Debug for CompensationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompensationAction").finish_non_exhaustive()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}

/// Compensation state of a single action or of a whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompensationState {
    /// Nothing was registered.
    None,
    /// Executed and returned `Ok`.
    Completed,
    /// Executed and returned `Err` or panicked.
    Failed,
}

impl CompensationState {
    /// Returns the string representation of the state.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// Result of one executed action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompensationRecord {
    /// Zero-based registration index.
    pub index: usize,
    /// `Completed` or `Failed`.
    pub state: CompensationState,
    /// Failure message when the action failed.
    pub error: Option<String>,
}

/// Summary of a compensation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompensationReport {
    /// One record per registered action, in execution order.
    pub records: Vec<CompensationRecord>,
}

impl CompensationReport {
    /// Overall state of the run.
    pub fn state(&self) -> CompensationState {
        if self.records.is_empty() {
            CompensationState::None
        } else if self.failed_count() > 0 {
            CompensationState::Failed
        } else {
            CompensationState::Completed
        }
    }

    /// Whether every action completed.
    pub fn all_succeeded(&self) -> bool {
        self.failed_count() == 0
    }

    /// Number of failed actions.
    pub fn failed_count(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.state == CompensationState::Failed)
            .count()
    }

    /// Failed records.
    pub fn failures(&self) -> impl Iterator<Item = &CompensationRecord> {
        self.records
            .iter()
            .filter(|r| r.state == CompensationState::Failed)
    }
}

/// Ordered, append-only list of compensation actions for one call.
#[derive(Debug, Default)]
pub struct CompensationRegistry {
    actions: Vec<CompensationAction>,
    frozen: bool,
}

impl CompensationRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an action and return its registration index.
    ///
    /// Returns the action back when the registry is frozen.
    pub fn register(
        &mut self,
        action: CompensationAction,
    ) -> std::result::Result<usize, CompensationAction> {
        if self.frozen {
            return Err(action);
        }
        self.actions.push(action);
        Ok(self.actions.len() - 1)
    }

    /// Reject any further registration.
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    /// Whether registration is closed.
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Number of registered actions.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether no actions were registered.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Drop every action without running it. Returns how many were dropped.
    pub fn discard(self, call_id: Uuid) -> usize {
        let count = self.actions.len();
        if count > 0 {
            debug!(%call_id, count, "Discarding compensations for successful call");
        }
        count
    }

    /// Run every action in registration order, isolating failures.
    ///
    /// Never fails: each action's failure is logged and recorded in the report.
    pub async fn run(self, call_id: Uuid) -> CompensationReport {
        if self.actions.is_empty() {
            debug!(%call_id, "No compensations to run");
            return CompensationReport::default();
        }

        info!(%call_id, count = self.actions.len(), "Running compensations");

        let mut records = Vec::with_capacity(self.actions.len());
        for (index, action) in self.actions.into_iter().enumerate() {
            let record = match action.execute().await {
                Ok(()) => {
                    debug!(%call_id, index, "Compensation completed");
                    CompensationRecord {
                        index,
                        state: CompensationState::Completed,
                        error: None,
                    }
                }
                Err(error) => {
                    warn!(%call_id, index, error = %error, "Compensation failed");
                    CompensationRecord {
                        index,
                        state: CompensationState::Failed,
                        error: Some(error),
                    }
                }
            };
            records.push(record);
        }

        let report = CompensationReport { records };
        info!(
            %call_id,
            state = report.state().as_str(),
            failed = report.failed_count(),
            "All compensations completed"
        );
        report
    }
}
