// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Argument projection tests across the four view combinations.

mod common;

use common::*;
use rpcall_core::{
    ArgumentTree, ProjectedValue, ProjectionError, ProjectionOptions, REDACTED_SENTINEL,
    TypedValue, project,
};
use serde_json::json;

const ALL_OPTIONS: [(bool, bool); 4] = [(true, true), (true, false), (false, true), (false, false)];

#[test]
fn test_user_scenario_redacted_and_plain() {
    let call = user_call();

    let redacted = call.redacted_arguments().unwrap();
    assert_eq!(
        redacted.to_json(),
        json!({"user": {"id": 42, "password": "*** omitted ***"}})
    );

    let plain = call.plain_arguments().unwrap();
    assert_eq!(
        plain.to_json(),
        json!({"user": {"id": 42, "password": "secret"}})
    );
}

#[test]
fn test_projection_is_deterministic() {
    let tree = order_arguments();
    for (plain, redact) in ALL_OPTIONS {
        let options = ProjectionOptions::new(plain, redact);
        let first = project(&tree, &options).unwrap();
        let second = project(&tree, &options).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }
}

#[test]
fn test_redaction_never_leaks_secure_values() {
    let tree = order_arguments();
    let secrets = ["4111111111111111", "123", "sk-live-abc"];

    for plain in [true, false] {
        let projected = project(&tree, &ProjectionOptions::new(plain, true)).unwrap();
        let rendered = serde_json::to_string(&projected).unwrap();
        for secret in secrets {
            assert!(
                !string_leaves(&projected.to_json()).iter().any(|s| s == secret),
                "secret {secret} leaked in {rendered}"
            );
        }

        let customer = projected
            .get("customer")
            .and_then(ProjectedValue::as_nested)
            .unwrap();
        assert!(customer.get("card").unwrap().is_redacted());
        assert!(projected.get("api_key").unwrap().is_redacted());
        assert!(!projected.leaf_paths().iter().any(|p| p.starts_with("customer.card.")));
    }
}

#[test]
fn test_unredacted_views_share_leaf_set() {
    let tree = order_arguments();
    let plain = project(&tree, &ProjectionOptions::plain_view()).unwrap();
    let typed = project(&tree, &ProjectionOptions::typed_view()).unwrap();

    assert_eq!(plain.leaf_paths(), typed.leaf_paths());
    assert!(plain.leaf_paths().contains(&"customer.card.cvv".to_string()));
    assert!(plain.leaf_paths().contains(&"lines.1.qty".to_string()));
}

#[test]
fn test_views_differ_only_in_representation() {
    let tree = order_arguments();
    let plain = project(&tree, &ProjectionOptions::plain_view()).unwrap();
    let typed = project(&tree, &ProjectionOptions::typed_view()).unwrap();

    assert_eq!(plain.get("order_id"), Some(&ProjectedValue::Plain(json!("ord-7"))));
    assert_eq!(
        typed.get("order_id"),
        Some(&ProjectedValue::Typed(TypedValue::string("ord-7")))
    );
    assert_eq!(plain.get("coupon"), Some(&ProjectedValue::Null));
    assert_eq!(typed.get("coupon"), Some(&ProjectedValue::Null));
}

#[test]
fn test_json_rendering_matches_serde_for_every_view() {
    let tree = order_arguments();
    for (plain, redact) in ALL_OPTIONS {
        let projected = project(&tree, &ProjectionOptions::new(plain, redact)).unwrap();
        assert_eq!(
            serde_json::to_value(&projected).unwrap(),
            projected.to_json(),
            "plain={plain} redact_secure={redact}"
        );
    }
}

#[test]
fn test_decoded_tree_keeps_redaction() {
    let encoded = serde_json::to_value(user_arguments()).unwrap();
    let decoded: ArgumentTree = serde_json::from_value(encoded).unwrap();

    let redacted = project(&decoded, &ProjectionOptions::redacted_view()).unwrap();
    assert_eq!(
        redacted.to_json(),
        json!({"user": {"id": 42, "password": REDACTED_SENTINEL}})
    );
    assert_eq!(serde_json::to_value(&redacted).unwrap(), redacted.to_json());
}

#[test]
fn test_decoding_rejects_repeated_secure_name() {
    let secret = json!({"kind": "typed", "value": {"type": "string", "value": "secret"}});
    let raw = json!({
        "fields": [{
            "name": "user",
            "value": {"kind": "tree", "value": {"fields": [
                {"name": "password", "value": secret, "schema": {"type_name": "string", "secure": true}},
                {"name": "password", "value": secret, "schema": {"type_name": "string", "secure": false}}
            ]}},
            "schema": {"type_name": "struct"}
        }]
    });

    let err = serde_json::from_value::<ArgumentTree>(raw).unwrap_err();
    assert!(err.to_string().contains("duplicate field 'password'"), "{err}");
}

#[test]
fn test_redacted_field_renders_sentinel() {
    let projected = project(&order_arguments(), &ProjectionOptions::redacted_view()).unwrap();
    assert_eq!(projected.to_json()["api_key"], json!(REDACTED_SENTINEL));
    assert_eq!(projected.to_json()["customer"]["card"], json!(REDACTED_SENTINEL));
    assert_eq!(projected.to_json()["customer"]["email"], json!("ada@example.com"));
}

#[test]
fn test_empty_tree_all_combinations() {
    for (plain, redact) in ALL_OPTIONS {
        let projected = project(&ArgumentTree::new(), &ProjectionOptions::new(plain, redact)).unwrap();
        assert!(projected.is_empty());
    }
}

#[test]
fn test_pathological_depth_is_rejected() {
    let mut tree = ArgumentTree::new().with("leaf", TypedValue::int(0));
    for _ in 0..1_000 {
        tree = ArgumentTree::new().with("next", tree);
    }

    let err = project(&tree, &ProjectionOptions::plain_view()).unwrap_err();
    match err {
        ProjectionError::DepthExceeded { max_depth, path } => {
            assert_eq!(max_depth, 64);
            assert_eq!(path.split('.').count(), 64);
        }
    }
}

#[test]
fn test_call_views_respect_builder_depth() {
    let tree = ArgumentTree::new().with("a", ArgumentTree::new().with("b", TypedValue::int(1)));
    let call = rpcall_core::MethodCall::builder("svc", "m")
        .arguments(tree)
        .max_argument_depth(2)
        .build()
        .unwrap();

    assert!(call.typed_arguments().is_ok());
    assert!(
        call.project_arguments(ProjectionOptions::typed_view().with_max_depth(1))
            .is_err()
    );
}
