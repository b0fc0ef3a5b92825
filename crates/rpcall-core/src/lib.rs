// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! rpcall Core - Per-request core of an RPC service runtime
//!
//! This crate manages a single remote procedure call from the moment the
//! protocol codec has decoded it until the reply encoder takes its outcome.
//! It guarantees that every call yields exactly one reply, exposes redacted
//! and typed views of the call arguments, and undoes partially applied side
//! effects when the call fails.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Broker transport + protocol codec                     │
//! │              (headers, raw body, service/method, ArgumentTree)           │
//! └─────────────────────────────────────────────────────────────────────────┘
//!                                    │ MethodCall::builder
//!                                    ▼
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              CallRunner                                  │
//! │      log start ─► Dispatch::dispatch ─► timeout / lost reply check       │
//! │                 ─► compensations (on failure) ─► CompletedCall           │
//! └─────────────────────────────────────────────────────────────────────────┘
//!           │                                              │
//!           │ &mut MethodCall                              │ Reply
//!           ▼                                              ▼
//! ┌───────────────────────┐                    ┌─────────────────────────────┐
//! │  Application handler  │                    │       Reply encoder         │
//! │  projections, header  │                    │  (result / exception /      │
//! │  lookups, set_*, comp │                    │   transport error)          │
//! └───────────────────────┘                    └─────────────────────────────┘
//! ```
//!
//! # Call Lifecycle
//!
//! | Operation | Allowed in | Effect |
//! |-----------|------------|--------|
//! | `set_result` | Pending | Finished(Result) |
//! | `set_application_exception` / `set_error` | Pending | Finished(ApplicationException) |
//! | `set_transport_error` | Pending | Finished(TransportError) |
//! | `add_compensation` | Pending | Appends an undo action |
//! | any of the above | Finished | `CallError`, logged at `error` |
//!
//! # Argument Views
//!
//! | View | `plain` | `redact_secure` | Audience |
//! |------|---------|-----------------|----------|
//! | `plain_arguments` | yes | no | trusted internal logs |
//! | `typed_arguments` | no | no | dispatch logic |
//! | `redacted_arguments` | yes | yes | untrusted logs, audit |
//!
//! # Configuration
//!
//! Configuration is loaded from environment variables:
//!
//! | Variable | Required | Default | Description |
//! |----------|----------|---------|-------------|
//! | `RPCALL_MAX_ARGUMENT_DEPTH` | No | `64` | Maximum argument tree depth |
//! | `RPCALL_CALL_TIMEOUT_MS` | No | `30000` | Dispatch timeout, `0` disables |
//! | `RPCALL_ARGUMENT_LOGGING` | No | `redacted` | `off`, `redacted` or `full` |
//!
//! # Modules
//!
//! - [`arguments`]: Argument tree, fields and typed values
//! - [`call`]: The method call aggregate and its lifecycle
//! - [`compensation`]: Compensation registry with per-action fault isolation
//! - [`config`]: Runtime configuration from environment variables
//! - [`error`]: Lifecycle error types with error codes
//! - [`outcome`]: Terminal outcome and reply envelope
//! - [`projection`]: Secure argument projection
//! - [`runner`]: Step runner driving dispatch and compensation
//! - [`transport`]: Transport metadata and header lookup

#![deny(missing_docs)]

/// Argument tree produced by the protocol codec.
pub mod arguments;

/// Method call aggregate and lifecycle state machine.
pub mod call;

/// Compensation registry and run reports.
pub mod compensation;

/// Runtime configuration loaded from environment variables.
pub mod config;

/// Error types for lifecycle operations with error code mapping.
pub mod error;

/// Terminal outcome and reply envelope.
pub mod outcome;

/// Secure argument projection.
pub mod projection;

/// Step runner for dispatch, timeouts and compensation.
pub mod runner;

/// Transport metadata and case-insensitive header lookup.
pub mod transport;

pub use arguments::{ArgumentTree, Field, FieldSchema, FieldValue, TypedValue};
pub use call::{
    Authentication, CallHooks, CallState, MethodCall, MethodCallBuilder, MethodName, ServiceName,
};
pub use compensation::{
    CompensationAction, CompensationRecord, CompensationRegistry, CompensationReport,
    CompensationState,
};
pub use config::{ArgumentLogging, Config, ConfigError};
pub use error::{CallError, Result};
pub use outcome::{ApplicationException, Outcome, OutcomeKind, Reply, ReturnValue};
pub use projection::{
    ProjectedMap, ProjectedValue, ProjectionError, ProjectionOptions, REDACTED_SENTINEL, project,
};
pub use runner::{CallRunner, CompletedCall, Dispatch};
pub use transport::{Headers, TransportMetadata};
