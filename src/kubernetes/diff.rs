// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Comparison of desired objects against what the cluster stores.
//!
//! The operator owns exactly the fields its builders serialize. Anything else
//! on a stored object (defaults, cluster IPs, status, annotations added by
//! other controllers) is left alone and never causes a write.

use serde_json::{Map, Value};

/// Values the builders emit to mean "not set"
fn is_unset(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.values().all(is_unset),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// Whether every field set in `desired` holds the same value in `current`.
///
/// Objects compare key by key, arrays element by element (and must have the
/// same length), scalars by equality.
pub fn is_subset(desired: &Value, current: &Value) -> bool {
    if is_unset(desired) {
        return true;
    }

    match (desired, current) {
        (Value::Object(desired), Value::Object(current)) => desired.iter().all(|(key, value)| {
            match current.get(key) {
                Some(existing) => is_subset(value, existing),
                None => is_unset(value),
            }
        }),
        (Value::Array(desired), Value::Array(current)) => {
            desired.len() == current.len()
                && desired.iter().zip(current).all(|(d, c)| is_subset(d, c))
        }
        (desired, current) => desired == current,
    }
}

/// Fold owner references already on `current` into `desired`.
///
/// Owner references form a set keyed by uid: a shared object keeps the owners
/// other installations added, and a reference with a known uid is replaced in
/// place.
pub fn union_owner_references(desired: &mut Value, current: &Value) {
    let Some(existing) = current
        .pointer("/metadata/ownerReferences")
        .and_then(Value::as_array)
    else {
        return;
    };
    let Some(metadata) = desired.get_mut("metadata").and_then(Value::as_object_mut) else {
        return;
    };

    let wanted: Vec<Value> = metadata
        .get("ownerReferences")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let mut merged: Vec<Value> = existing
        .iter()
        .map(|reference| {
            wanted
                .iter()
                .find(|w| same_uid(w, reference))
                .cloned()
                .unwrap_or_else(|| reference.clone())
        })
        .collect();
    merged.extend(
        wanted
            .into_iter()
            .filter(|w| !existing.iter().any(|e| same_uid(w, e))),
    );

    metadata.insert("ownerReferences".to_string(), Value::Array(merged));
}

fn same_uid(a: &Value, b: &Value) -> bool {
    match (a.get("uid"), b.get("uid")) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Overlay `desired` onto `current` as an RFC 7396 merge patch.
///
/// Arrays are replaced wholesale; fields only present on `current` survive.
pub fn merge(current: &Value, desired: &Value) -> Value {
    let mut merged = current.clone();
    json_patch::merge(&mut merged, &strip_nulls(desired));
    merged
}

/// Drop nulls so the merge never deletes fields the builders leave unset
fn strip_nulls(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k.clone(), strip_nulls(v)))
                .collect::<Map<String, Value>>(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(strip_nulls).collect()),
        other => other.clone(),
    }
}
