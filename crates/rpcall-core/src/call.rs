// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! The method call aggregate.
//!
//! A [`MethodCall`] is created once per inbound invocation and is owned by a
//! single dispatch flow. It starts `Pending` and moves to `Finished` through
//! exactly one finishing operation:
//!
//! ```text
//!                 ┌─────────┐
//!                 │ PENDING │◄── add_compensation
//!                 └────┬────┘
//!        ┌─────────────┼──────────────────┐
//!  set_result   set_application_exception  set_transport_error
//!        │        (set_error)             │
//!        ▼             ▼                  ▼
//!   ┌──────────────────────────────────────────┐
//!   │          FINISHED(outcome)               │──► any finishing call: ALREADY_FINISHED
//!   └──────────────────────────────────────────┘
//! ```
//!
//! Finishing twice never overwrites the first outcome; it returns
//! [`CallError::AlreadyFinished`] and is logged at `error` level.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error};
use uuid::Uuid;

use crate::arguments::ArgumentTree;
use crate::compensation::{CompensationAction, CompensationRegistry};
use crate::error::{CallError, Result};
use crate::outcome::{ApplicationException, Outcome, OutcomeKind, ReturnValue};
use crate::projection::{self, DEFAULT_MAX_DEPTH, ProjectedMap, ProjectionError, ProjectionOptions};
use crate::transport::{Headers, TransportMetadata};

macro_rules! descriptor {
    ($(#[$meta:meta])* $name:ident, $field:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Validate and wrap a name. Surrounding whitespace is trimmed.
            pub fn new(name: impl Into<String>) -> Result<Self> {
                let name = name.into();
                let trimmed = name.trim();
                if trimmed.is_empty() {
                    return Err(CallError::Validation {
                        field: $field.to_string(),
                        message: "must not be empty".to_string(),
                    });
                }
                Ok(Self(trimmed.to_string()))
            }

            /// The name as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

descriptor!(
    /// Name of the target service.
    ServiceName,
    "service"
);
descriptor!(
    /// Name of the target method within its service.
    MethodName,
    "method"
);

/// Result of the external authorization decision, stored read-only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Authentication {
    /// No credentials were presented.
    #[default]
    Anonymous,
    /// Credentials were verified.
    Authenticated {
        /// Authenticated principal.
        principal: String,
        /// Claims issued for the principal.
        #[serde(default)]
        claims: BTreeMap<String, Value>,
    },
    /// Credentials were presented and rejected.
    Denied {
        /// Reason given by the authorizer.
        reason: String,
    },
}

impl Authentication {
    /// Authenticated principal without claims.
    pub fn principal(principal: impl Into<String>) -> Self {
        Self::Authenticated {
            principal: principal.into(),
            claims: BTreeMap::new(),
        }
    }

    /// Principal name, when authenticated.
    pub fn principal_name(&self) -> Option<&str> {
        match self {
            Self::Authenticated { principal, .. } => Some(principal),
            _ => None,
        }
    }

    /// Whether credentials were verified.
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated { .. })
    }
}

/// Lifecycle state of a call.
#[derive(Debug, Clone, PartialEq)]
pub enum CallState {
    /// No finishing operation has run.
    Pending,
    /// Terminal; carries the single outcome.
    Finished(Outcome),
}

/// Scheduler-facing notification interface.
///
/// Invoked synchronously, exactly once per call, when the outcome is set.
pub trait CallHooks: Send + Sync {
    /// The call reached `Finished` with `outcome`.
    fn outcome_ready(&self, call_id: Uuid, outcome: &Outcome);
}

/// Builder for [`MethodCall`], used by the protocol codec.
pub struct MethodCallBuilder {
    service: String,
    method: String,
    arguments: ArgumentTree,
    transport: TransportMetadata,
    authentication: Authentication,
    extra: BTreeMap<String, Value>,
    max_argument_depth: usize,
    hooks: Option<Arc<dyn CallHooks>>,
}

impl fmt::Debug for MethodCallBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodCallBuilder")
            .field("service", &self.service)
            .field("method", &self.method)
            .field("hooks", &self.hooks.as_ref().map(|_| "..."))
            .finish_non_exhaustive()
    }
}

impl MethodCallBuilder {
    /// Set the root argument tree.
    pub fn arguments(mut self, arguments: ArgumentTree) -> Self {
        self.arguments = arguments;
        self
    }

    /// Set the transport metadata.
    pub fn transport(mut self, transport: TransportMetadata) -> Self {
        self.transport = transport;
        self
    }

    /// Set the authorization result.
    pub fn authentication(mut self, authentication: Authentication) -> Self {
        self.authentication = authentication;
        self
    }

    /// Attach one entry of extension metadata.
    pub fn extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Depth limit for argument projections.
    ///
    /// Default: 64
    pub fn max_argument_depth(mut self, max_depth: usize) -> Self {
        self.max_argument_depth = max_depth.max(1);
        self
    }

    /// Register the scheduler notification hooks.
    pub fn hooks(mut self, hooks: Arc<dyn CallHooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    /// Build the call.
    ///
    /// Returns a validation error if the service or method name is empty.
    pub fn build(self) -> Result<MethodCall> {
        let service = ServiceName::new(self.service)?;
        let method = MethodName::new(self.method)?;

        Ok(MethodCall {
            id: Uuid::new_v4(),
            service,
            method,
            arguments: self.arguments,
            transport: self.transport,
            authentication: self.authentication,
            extra: self.extra,
            created_at: Utc::now(),
            started: Instant::now(),
            max_argument_depth: self.max_argument_depth,
            state: CallState::Pending,
            compensations: CompensationRegistry::new(),
            hooks: self.hooks,
        })
    }
}

/// One inbound invocation: descriptors, arguments, transport metadata, and
/// the single outcome slot.
pub struct MethodCall {
    id: Uuid,
    service: ServiceName,
    method: MethodName,
    arguments: ArgumentTree,
    transport: TransportMetadata,
    authentication: Authentication,
    extra: BTreeMap<String, Value>,
    created_at: DateTime<Utc>,
    started: Instant,
    max_argument_depth: usize,
    state: CallState,
    compensations: CompensationRegistry,
    hooks: Option<Arc<dyn CallHooks>>,
}

impl fmt::Debug for MethodCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodCall")
            .field("id", &self.id)
            .field("service", &self.service)
            .field("method", &self.method)
            .field("created_at", &self.created_at)
            .field("state", &self.state)
            .field("compensations", &self.compensations.len())
            .finish_non_exhaustive()
    }
}

impl MethodCall {
    /// Start building a call for `service.method`.
    pub fn builder(service: impl Into<String>, method: impl Into<String>) -> MethodCallBuilder {
        MethodCallBuilder {
            service: service.into(),
            method: method.into(),
            arguments: ArgumentTree::new(),
            transport: TransportMetadata::default(),
            authentication: Authentication::default(),
            extra: BTreeMap::new(),
            max_argument_depth: DEFAULT_MAX_DEPTH,
            hooks: None,
        }
    }

    /// Unique call ID.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Target service.
    pub fn service(&self) -> &ServiceName {
        &self.service
    }

    /// Target method.
    pub fn method(&self) -> &MethodName {
        &self.method
    }

    /// Authorization result.
    pub fn authentication(&self) -> &Authentication {
        &self.authentication
    }

    /// When the call was created.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Time since the call was created.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Extension metadata supplied at construction.
    pub fn extra(&self) -> &BTreeMap<String, Value> {
        &self.extra
    }

    // ========================================================================
    // Arguments
    // ========================================================================

    /// The raw argument tree.
    pub fn arguments(&self) -> &ArgumentTree {
        &self.arguments
    }

    /// Project the arguments with explicit options.
    ///
    /// The call's depth limit applies when it is stricter than `options`.
    pub fn project_arguments(
        &self,
        options: ProjectionOptions,
    ) -> std::result::Result<ProjectedMap, ProjectionError> {
        let options = options.with_max_depth(options.max_depth.min(self.max_argument_depth));
        projection::project(&self.arguments, &options)
    }

    /// Plain scalars, unredacted. For trusted internal logs.
    pub fn plain_arguments(&self) -> std::result::Result<ProjectedMap, ProjectionError> {
        self.project_arguments(ProjectionOptions::plain_view())
    }

    /// Typed wrappers, unredacted. For dispatch logic.
    pub fn typed_arguments(&self) -> std::result::Result<ProjectedMap, ProjectionError> {
        self.project_arguments(ProjectionOptions::typed_view())
    }

    /// Plain scalars with secure fields replaced. For untrusted logs and audit.
    pub fn redacted_arguments(&self) -> std::result::Result<ProjectedMap, ProjectionError> {
        self.project_arguments(ProjectionOptions::redacted_view())
    }

    // ========================================================================
    // Transport
    // ========================================================================

    /// Transport metadata.
    pub fn transport(&self) -> &TransportMetadata {
        &self.transport
    }

    /// Case-insensitive header lookup; see [`Headers::get`].
    pub fn header(&self, key: &str) -> Option<&str> {
        self.transport.header(key)
    }

    /// All headers, unmodified.
    pub fn headers(&self) -> &Headers {
        self.transport.headers()
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Current lifecycle state.
    pub fn state(&self) -> &CallState {
        &self.state
    }

    /// Whether a finishing operation has run.
    pub fn is_finished(&self) -> bool {
        matches!(self.state, CallState::Finished(_))
    }

    /// The outcome, once finished.
    pub fn outcome(&self) -> Option<&Outcome> {
        match &self.state {
            CallState::Finished(outcome) => Some(outcome),
            CallState::Pending => None,
        }
    }

    /// Finish with a return value.
    pub fn set_result(&mut self, value: impl Into<ReturnValue>) -> Result<()> {
        self.finish(Outcome::Result(value.into()))
    }

    /// Finish with an application exception.
    pub fn set_application_exception(&mut self, exception: ApplicationException) -> Result<()> {
        self.finish(Outcome::ApplicationException(exception))
    }

    /// Finish with a generic application exception of kind `UNKNOWN`.
    pub fn set_error(&mut self, message: impl Into<String>) -> Result<()> {
        self.set_application_exception(ApplicationException::unknown(message))
    }

    /// Finish with a transport or protocol error.
    pub fn set_transport_error(&mut self, message: impl Into<String>) -> Result<()> {
        self.finish(Outcome::TransportError(message.into()))
    }

    fn finish(&mut self, outcome: Outcome) -> Result<()> {
        if let CallState::Finished(existing) = &self.state {
            let err = CallError::AlreadyFinished {
                call_id: self.id,
                existing: existing.kind(),
                attempted: outcome.kind(),
            };
            error!(
                call_id = %self.id,
                service = %self.service,
                method = %self.method,
                existing = %existing.kind(),
                attempted = %outcome.kind(),
                "Finishing operation called on a finished call"
            );
            return Err(err);
        }

        self.compensations.freeze();
        debug!(
            call_id = %self.id,
            outcome = %outcome.kind(),
            compensations = self.compensations.len(),
            "Call finished"
        );
        self.state = CallState::Finished(outcome);

        if let (Some(hooks), CallState::Finished(outcome)) = (&self.hooks, &self.state) {
            hooks.outcome_ready(self.id, outcome);
        }
        Ok(())
    }

    /// Consume the call and return its outcome, for the reply encoder.
    pub fn into_outcome(self) -> Result<Outcome> {
        match self.state {
            CallState::Finished(outcome) => Ok(outcome),
            CallState::Pending => Err(CallError::NotFinished { call_id: self.id }),
        }
    }

    // ========================================================================
    // Compensation
    // ========================================================================

    /// Register an async undo action. Returns its registration index.
    pub fn add_compensation<F, Fut>(&mut self, action: F) -> Result<usize>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.register_compensation(CompensationAction::new(action))
    }

    /// Register a synchronous undo action. Returns its registration index.
    pub fn add_compensation_fn<F>(&mut self, action: F) -> Result<usize>
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        self.register_compensation(CompensationAction::from_fn(action))
    }

    fn register_compensation(&mut self, action: CompensationAction) -> Result<usize> {
        match self.compensations.register(action) {
            Ok(index) => {
                debug!(call_id = %self.id, index, "Compensation registered");
                Ok(index)
            }
            Err(_) => {
                let existing = self
                    .outcome()
                    .map(Outcome::kind)
                    .unwrap_or(OutcomeKind::TransportError);
                error!(
                    call_id = %self.id,
                    existing = %existing,
                    "Compensation registered on a finished call"
                );
                Err(CallError::CompensationAfterFinish {
                    call_id: self.id,
                    existing,
                })
            }
        }
    }

    /// Number of registered compensations.
    pub fn compensation_count(&self) -> usize {
        self.compensations.len()
    }

    /// Hand the frozen registry to the scheduler.
    ///
    /// Only valid once the call has finished.
    pub fn take_compensations(&mut self) -> Result<CompensationRegistry> {
        if !self.is_finished() {
            return Err(CallError::NotFinished { call_id: self.id });
        }
        let mut taken = std::mem::take(&mut self.compensations);
        self.compensations.freeze();
        taken.freeze();
        Ok(taken)
    }
}
