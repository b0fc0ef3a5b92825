// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for method call lifecycle operations.
//!
//! Every variant except `Validation` is a programming-contract violation: the
//! dispatch flow tried to produce a second reply, or touched the compensation
//! registry after the reply was fixed.

use thiserror::Error;
use uuid::Uuid;

use crate::outcome::{OutcomeKind, Reply, TRANSPORT_ERROR_CODE};

/// Result type using CallError
pub type Result<T> = std::result::Result<T, CallError>;

/// Errors raised by [`MethodCall`](crate::call::MethodCall) operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum CallError {
    /// A finishing operation was called on a call that already has an outcome.
    #[error("call '{call_id}' already finished with {existing}; refusing to record {attempted}")]
    AlreadyFinished {
        /// The call ID.
        call_id: Uuid,
        /// Outcome recorded first.
        existing: OutcomeKind,
        /// Outcome the caller tried to record.
        attempted: OutcomeKind,
    },

    /// A compensation was registered after the call finished.
    #[error("call '{call_id}' already finished with {existing}; compensations are frozen")]
    CompensationAfterFinish {
        /// The call ID.
        call_id: Uuid,
        /// Outcome already recorded.
        existing: OutcomeKind,
    },

    /// The outcome was requested before any finishing operation ran.
    #[error("call '{call_id}' has not finished")]
    NotFinished {
        /// The call ID.
        call_id: Uuid,
    },

    /// Input validation failed while building a call.
    #[error("Validation error for '{field}': {message}")]
    Validation {
        /// The field that failed validation.
        field: String,
        /// The validation error message.
        message: String,
    },
}

impl CallError {
    /// Get the error code string for this error type.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::AlreadyFinished { .. } => "ALREADY_FINISHED",
            Self::CompensationAfterFinish { .. } => "COMPENSATION_AFTER_FINISH",
            Self::NotFinished { .. } => "NOT_FINISHED",
            Self::Validation { .. } => "VALIDATION_ERROR",
        }
    }

    /// Whether this error signals a double-reply or lost-reply bug.
    pub fn is_contract_violation(&self) -> bool {
        !matches!(self, Self::Validation { .. })
    }

    /// Convert this error to a transport error reply.
    pub fn to_reply(&self) -> Reply {
        Reply::TransportError {
            code: TRANSPORT_ERROR_CODE.to_string(),
            message: self.to_string(),
        }
    }
}
