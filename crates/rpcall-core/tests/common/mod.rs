// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Common test infrastructure for rpcall-core integration tests.
//!
//! Provides argument fixtures, transport fixtures and a recorder for
//! compensation actions.

#![allow(dead_code)]

use std::sync::{Arc, Mutex, Once};

use rpcall_core::{ArgumentTree, Field, Headers, MethodCall, TransportMetadata, TypedValue};

static TRACING: Once = Once::new();

/// Install a test subscriber once so log output shows up with `--nocapture`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("rpcall_core=debug")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// `{user: {id: 42, password: "secret"}}` with `password` marked secure.
pub fn user_arguments() -> ArgumentTree {
    ArgumentTree::new().with(
        "user",
        ArgumentTree::new()
            .with("id", TypedValue::int(42))
            .with_secure("password", TypedValue::string("secret")),
    )
}

/// A wider tree mixing secure subtrees, nulls and several levels.
pub fn order_arguments() -> ArgumentTree {
    ArgumentTree::new()
        .with("order_id", TypedValue::string("ord-7"))
        .with(
            "customer",
            ArgumentTree::new()
                .with("name", TypedValue::string("Ada"))
                .with("email", TypedValue::string("ada@example.com"))
                .with_field(Field::secure(
                    "card",
                    ArgumentTree::new()
                        .with("number", TypedValue::string("4111111111111111"))
                        .with("cvv", TypedValue::string("123")),
                )),
        )
        .with(
            "lines",
            ArgumentTree::new()
                .with(
                    "0",
                    ArgumentTree::new()
                        .with("sku", TypedValue::string("A-1"))
                        .with("qty", TypedValue::int(2)),
                )
                .with(
                    "1",
                    ArgumentTree::new()
                        .with("sku", TypedValue::string("B-2"))
                        .with("qty", TypedValue::int(1)),
                ),
        )
        .with("coupon", None::<TypedValue>)
        .with("gift", TypedValue::bool(false))
        .with_secure("api_key", TypedValue::string("sk-live-abc"))
}

/// Transport metadata with a couple of mixed-case headers.
pub fn transport() -> TransportMetadata {
    let headers: Headers = [
        ("Content-Type", "application/json"),
        ("X-Request-Id", "req-123"),
        ("x-tenant", "acme"),
    ]
    .into_iter()
    .collect();
    TransportMetadata::new(headers, &br#"{"user":{"id":42}}"#[..])
        .with_correlation_id("corr-1")
        .with_reply_to("rpc.reply.client-1")
}

/// A pending call to `users.get_user` carrying [`user_arguments`].
pub fn user_call() -> MethodCall {
    MethodCall::builder("users", "get_user")
        .arguments(user_arguments())
        .transport(transport())
        .build()
        .expect("valid call")
}

/// Shared log of which compensation actions ran, in order.
#[derive(Clone, Default)]
pub struct Recorder {
    events: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, event: impl Into<String>) {
        self.events.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

/// Collect every string leaf of a JSON value, recursively.
pub fn string_leaves(value: &serde_json::Value) -> Vec<String> {
    let mut out = Vec::new();
    collect(value, &mut out);
    out
}

fn collect(value: &serde_json::Value, out: &mut Vec<String>) {
    match value {
        serde_json::Value::String(s) => out.push(s.clone()),
        serde_json::Value::Object(map) => map.values().for_each(|v| collect(v, out)),
        serde_json::Value::Array(items) => items.iter().for_each(|v| collect(v, out)),
        _ => {}
    }
}
