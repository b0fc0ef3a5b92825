// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Terminal outcome of a method call and its reply envelope.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::arguments::TypedValue;

/// Kind used for application exceptions raised from a bare message.
pub const UNKNOWN_EXCEPTION_KIND: &str = "UNKNOWN";

/// Error code carried by transport error replies.
pub const TRANSPORT_ERROR_CODE: &str = "TRANSPORT_ERROR";

/// Discriminant of an [`Outcome`], used in logs and contract-violation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    /// Successful return value.
    Result,
    /// Declared or generic application-level fault.
    ApplicationException,
    /// Protocol or infrastructure failure.
    TransportError,
}

impl OutcomeKind {
    /// Returns the string representation of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Result => "result",
            Self::ApplicationException => "application_exception",
            Self::TransportError => "transport_error",
        }
    }
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value passed to `set_result`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", content = "value", rename_all = "snake_case")]
pub enum ReturnValue {
    /// Already shaped to the method's declared return type.
    Shaped(TypedValue),
    /// Raw value the reply encoder must coerce to the declared type.
    Raw(Value),
}

impl ReturnValue {
    /// The scalar payload regardless of shape.
    pub fn value_plain(&self) -> &Value {
        match self {
            Self::Shaped(t) => t.value_plain(),
            Self::Raw(v) => v,
        }
    }
}

impl From<TypedValue> for ReturnValue {
    fn from(value: TypedValue) -> Self {
        Self::Shaped(value)
    }
}

impl From<Value> for ReturnValue {
    fn from(value: Value) -> Self {
        Self::Raw(value)
    }
}

/// Payload of an application exception.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "form", rename_all = "snake_case")]
pub enum ApplicationException {
    /// Exception declared in the service IDL, with its structured payload.
    Declared {
        /// Declared exception name.
        name: String,
        /// Structured exception fields.
        payload: Value,
    },
    /// Fault without an IDL declaration.
    Generic {
        /// Fault kind; [`UNKNOWN_EXCEPTION_KIND`] for bare messages.
        kind: String,
        /// Human-readable description.
        message: String,
    },
}

impl ApplicationException {
    /// IDL-declared exception.
    pub fn declared(name: impl Into<String>, payload: Value) -> Self {
        Self::Declared {
            name: name.into(),
            payload,
        }
    }

    /// Generic fault with an explicit kind.
    pub fn generic(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Generic {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Generic fault of kind `UNKNOWN`.
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::generic(UNKNOWN_EXCEPTION_KIND, message)
    }

    /// Declared name, or the kind of a generic fault.
    pub fn name(&self) -> &str {
        match self {
            Self::Declared { name, .. } => name,
            Self::Generic { kind, .. } => kind,
        }
    }
}

/// Single terminal result of a method call.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The method returned a value.
    Result(ReturnValue),
    /// The method raised an application-level exception.
    ApplicationException(ApplicationException),
    /// The call failed below the application layer.
    TransportError(String),
}

impl Outcome {
    /// Discriminant of this outcome.
    pub fn kind(&self) -> OutcomeKind {
        match self {
            Self::Result(_) => OutcomeKind::Result,
            Self::ApplicationException(_) => OutcomeKind::ApplicationException,
            Self::TransportError(_) => OutcomeKind::TransportError,
        }
    }

    /// Whether this is a successful result.
    pub fn is_result(&self) -> bool {
        matches!(self, Self::Result(_))
    }

    /// Whether registered compensations must run.
    pub fn requires_compensation(&self) -> bool {
        !self.is_result()
    }

    /// Convert this outcome to the envelope handed to the reply encoder.
    pub fn to_reply(&self) -> Reply {
        match self {
            Self::Result(ReturnValue::Shaped(t)) => Reply::Result {
                value: t.value_plain().clone(),
                declared_type: Some(t.type_name().to_string()),
            },
            Self::Result(ReturnValue::Raw(v)) => Reply::Result {
                value: v.clone(),
                declared_type: None,
            },
            Self::ApplicationException(exception) => Reply::ApplicationException {
                exception: exception.clone(),
            },
            Self::TransportError(message) => Reply::TransportError {
                code: TRANSPORT_ERROR_CODE.to_string(),
                message: message.clone(),
            },
        }
    }
}

/// Wire-neutral reply envelope for the reply-encoding boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Reply {
    /// Successful reply.
    Result {
        /// Return value.
        value: Value,
        /// Declared type when the value was already shaped; `None` means the
        /// encoder must coerce.
        #[serde(skip_serializing_if = "Option::is_none", default)]
        declared_type: Option<String>,
    },
    /// Application exception reply.
    ApplicationException {
        /// Exception payload.
        exception: ApplicationException,
    },
    /// Generic error reply.
    TransportError {
        /// Error code.
        code: String,
        /// Error message.
        message: String,
    },
}
