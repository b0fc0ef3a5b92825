// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Step runner that drives one method call to exactly one reply.
//!
//! The runner owns the scheduler-side half of the lifecycle contract:
//!
//! 1. log the call start with the configured argument view,
//! 2. run the [`Dispatch`] handler, bounded by the configured timeout,
//! 3. turn a timeout, a handler error or a missing reply into a transport error,
//! 4. run compensations when the outcome is not a result, discard them otherwise,
//! 5. hand a [`CompletedCall`] to the reply encoder.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::call::{MethodCall, MethodCallBuilder, MethodName, ServiceName};
use crate::compensation::CompensationReport;
use crate::config::{ArgumentLogging, Config};
use crate::outcome::{Outcome, Reply};
use crate::projection::ProjectionOptions;

/// Transport error message recorded when a handler returns without replying.
pub const LOST_REPLY_MESSAGE: &str = "method returned without producing a reply";

/// Application dispatch logic for a method call.
///
/// Implementations call exactly one finishing operation on `call`. Returning
/// `Err` before finishing is reported to the caller as a transport error.
#[async_trait]
pub trait Dispatch: Send + Sync {
    /// Handle the call.
    async fn dispatch(&self, call: &mut MethodCall) -> anyhow::Result<()>;
}

/// A call that reached its terminal outcome and ran its compensation path.
#[derive(Debug, Clone)]
pub struct CompletedCall {
    /// Call ID.
    pub id: Uuid,
    /// Target service.
    pub service: ServiceName,
    /// Target method.
    pub method: MethodName,
    /// The single outcome.
    pub outcome: Outcome,
    /// Compensation run, present only when the outcome required one.
    pub compensation: Option<CompensationReport>,
    /// Time from call creation to completion.
    pub elapsed: Duration,
}

impl CompletedCall {
    /// Reply envelope for the reply encoder.
    pub fn reply(&self) -> Reply {
        self.outcome.to_reply()
    }

    /// Whether the call produced a result.
    pub fn is_success(&self) -> bool {
        self.outcome.is_result()
    }
}

/// Drives method calls through dispatch and the compensation path.
#[derive(Debug, Clone, Default)]
pub struct CallRunner {
    config: Config,
}

impl CallRunner {
    /// Create a runner with the given configuration.
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Runner configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Start building a call with this runner's argument depth limit applied.
    pub fn builder(
        &self,
        service: impl Into<String>,
        method: impl Into<String>,
    ) -> MethodCallBuilder {
        MethodCall::builder(service, method).max_argument_depth(self.config.max_argument_depth)
    }

    /// Run `handler` against `call` and complete the call.
    ///
    /// Always returns a completed call with exactly one outcome.
    #[instrument(skip_all, fields(call_id = %call.id(), service = %call.service(), method = %call.method()))]
    pub async fn run<D>(&self, mut call: MethodCall, handler: &D) -> CompletedCall
    where
        D: Dispatch + ?Sized,
    {
        self.log_start(&call);

        let dispatched = match self.config.call_timeout {
            Some(limit) => tokio::time::timeout(limit, handler.dispatch(&mut call))
                .await
                .ok(),
            None => Some(handler.dispatch(&mut call).await),
        };

        match dispatched {
            Some(Ok(())) if !call.is_finished() => {
                warn!("Dispatch returned without finishing the call");
                fail_pending(&mut call, LOST_REPLY_MESSAGE.to_string());
            }
            Some(Ok(())) => {}
            Some(Err(err)) if call.is_finished() => {
                error!(
                    error = %format!("{err:#}"),
                    "Dispatch failed after the call finished; keeping the recorded outcome"
                );
            }
            Some(Err(err)) => {
                warn!(error = %format!("{err:#}"), "Dispatch failed");
                fail_pending(&mut call, format!("{err:#}"));
            }
            None if call.is_finished() => {
                warn!("Call timed out after finishing; keeping the recorded outcome");
            }
            None => {
                let timeout_ms = self
                    .config
                    .call_timeout
                    .map(millis)
                    .unwrap_or_default();
                warn!(timeout_ms, "Call timed out");
                fail_pending(&mut call, format!("call timed out after {timeout_ms} ms"));
            }
        }

        let compensation = self.complete_compensation(&mut call).await;

        let id = call.id();
        let service = call.service().clone();
        let method = call.method().clone();
        let elapsed = call.elapsed();
        let outcome = call
            .into_outcome()
            .unwrap_or_else(|err| Outcome::TransportError(err.to_string()));

        info!(
            outcome = %outcome.kind(),
            elapsed_ms = millis(elapsed),
            compensated = compensation.is_some(),
            "Call completed"
        );

        CompletedCall {
            id,
            service,
            method,
            outcome,
            compensation,
            elapsed,
        }
    }

    fn log_start(&self, call: &MethodCall) {
        let options = match self.config.argument_logging {
            ArgumentLogging::Off => {
                info!(body_sha256 = %call.transport().body_digest(), "Call started");
                return;
            }
            ArgumentLogging::Redacted => ProjectionOptions::redacted_view(),
            ArgumentLogging::Full => ProjectionOptions::plain_view(),
        }
        .with_max_depth(self.config.max_argument_depth);

        match call.project_arguments(options) {
            Ok(arguments) => info!(
                arguments = %arguments.to_json(),
                body_sha256 = %call.transport().body_digest(),
                "Call started"
            ),
            Err(err) => warn!(
                error = %err,
                body_sha256 = %call.transport().body_digest(),
                "Call started; arguments could not be projected"
            ),
        }
    }

    async fn complete_compensation(&self, call: &mut MethodCall) -> Option<CompensationReport> {
        let requires_compensation = call
            .outcome()
            .map(Outcome::requires_compensation)
            .unwrap_or(true);

        let registry = match call.take_compensations() {
            Ok(registry) => registry,
            Err(err) => {
                error!(error = %err, "Compensations unavailable");
                return None;
            }
        };

        if requires_compensation {
            Some(registry.run(call.id()).await)
        } else {
            registry.discard(call.id());
            None
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn fail_pending(call: &mut MethodCall, message: String) {
    if call.is_finished() {
        return;
    }
    if let Err(err) = call.set_transport_error(message) {
        error!(error = %err, "Failed to record transport error");
    }
}
