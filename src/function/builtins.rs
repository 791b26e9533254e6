//! Copyright © 2025-2026 Wenze Wei. All Rights Reserved.
//!
//! This file is part of Piper.
//! The Piper project belongs to the Dunimd Team.
//!
//! Licensed under the Apache License, Version 2.0 (the "License");
//! You may not use this file except in compliance with the License.
//! You may obtain a copy of the License at
//!
//!     http://www.apache.org/licenses/LICENSE-2.0
//!
//! Unless required by applicable law or agreed to in writing, software
//! distributed under the License is distributed on an "AS IS" BASIS,
//! WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//! See the License for the specific language governing permissions and
//! limitations under the License.

//! # Piper Builtin Function Library
//!
//! Every script gets these functions. Type errors inside a builtin are cell
//! faults: the engine nulls the one output field and records a diagnostic,
//! the rest of the batch is untouched.

use std::collections::HashMap;
use std::sync::Arc;

use crate::errors::{PiperError, Result};
use crate::value::{PiperValue, PiperValueType};

use super::jsonpath::JsonPath;
use super::{binary_fn, invalid_argument, quaternary_fn, sync_fn, unary_fn, PiperFunction};

/// Mean Earth radius in kilometers, used by `distance`.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Builds the builtin registry. Called once per `Piper` construction.
pub(crate) fn builtin_functions() -> HashMap<String, Arc<dyn PiperFunction>> {
    let mut registry: HashMap<String, Arc<dyn PiperFunction>> = HashMap::new();
    let mut add = |name: &str, function: Arc<dyn PiperFunction>| {
        registry.insert(name.to_string(), function);
    };

    // Casts share PiperValue::cast_to, so cast behavior in expressions and
    // in user code cannot drift apart.
    add("string", Arc::new(unary_fn(|v: PiperValue| v.cast_to(PiperValueType::String))));
    add("int", Arc::new(unary_fn(|v: PiperValue| v.cast_to(PiperValueType::Int))));
    add("double", Arc::new(unary_fn(|v: PiperValue| v.cast_to(PiperValueType::Double))));
    add("bool", Arc::new(unary_fn(|v: PiperValue| v.cast_to(PiperValueType::Bool))));

    add("len", Arc::new(unary_fn(len)));
    add("upper", Arc::new(unary_fn(|s: String| s.to_uppercase())));
    add("lower", Arc::new(unary_fn(|s: String| s.to_lowercase())));
    add("trim", Arc::new(unary_fn(|s: String| s.trim().to_string())));

    add("abs", Arc::new(unary_fn(abs)));
    add("sqrt", Arc::new(unary_fn(|v: f64| v.sqrt())));
    add("distance", Arc::new(quaternary_fn(haversine_km)));

    add("coalesce", Arc::new(sync_fn(coalesce)));
    add("array_distinct", Arc::new(unary_fn(array_distinct)));

    add("get_json_object", Arc::new(binary_fn(get_json_object)));
    add("get_json_array", Arc::new(binary_fn(get_json_array)));

    registry
}

fn len(v: PiperValue) -> Result<PiperValue> {
    let length = match &v {
        PiperValue::String(s) => s.chars().count(),
        PiperValue::List(items) => items.len(),
        PiperValue::Map(map) => map.len(),
        PiperValue::Bytes(bytes) => bytes.len(),
        other => return Err(invalid_argument(0, other.value_type())),
    };
    Ok(PiperValue::Int(length as i64))
}

fn abs(v: PiperValue) -> Result<PiperValue> {
    match v {
        // i64::MIN has no positive twin; that is a fault, not a panic.
        PiperValue::Int(v) => v
            .checked_abs()
            .map(PiperValue::Int)
            .ok_or_else(|| PiperError::ArithmeticOverflow("abs".to_string())),
        PiperValue::Double(v) => Ok(PiperValue::Double(v.abs())),
        other => Err(invalid_argument(0, other.value_type())),
    }
}

/// Great-circle distance between two (lat, lon) points in degrees, in
/// kilometers, by the haversine formula.
fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();
    let a = (dlat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
}

/// First non-null argument, or Null when all are.
fn coalesce(args: Vec<PiperValue>) -> Result<PiperValue> {
    Ok(args
        .into_iter()
        .find(|v| !v.is_null())
        .unwrap_or(PiperValue::Null))
}

/// Deduplicates a list, keeping first occurrences in order.
fn array_distinct(items: Vec<PiperValue>) -> Vec<PiperValue> {
    let mut out: Vec<PiperValue> = Vec::with_capacity(items.len());
    for item in items {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}

fn parse_json_args(json: &str, path: &str) -> Result<(serde_json::Value, JsonPath)> {
    let doc: serde_json::Value =
        serde_json::from_str(json).map_err(|e| PiperError::InvalidJson(e.to_string()))?;
    let path = JsonPath::parse(path)?;
    Ok((doc, path))
}

/// First value matching the path, or Null on no match.
fn get_json_object(json: String, path: String) -> Result<PiperValue> {
    let (doc, path) = parse_json_args(&json, &path)?;
    Ok(path
        .query(&doc)
        .first()
        .map(|v| PiperValue::from((*v).clone()))
        .unwrap_or(PiperValue::Null))
}

/// Every value matching the path as a List, empty on no match.
fn get_json_array(json: String, path: String) -> Result<PiperValue> {
    let (doc, path) = parse_json_args(&json, &path)?;
    Ok(PiperValue::List(
        path.query(&doc)
            .into_iter()
            .map(|v| PiperValue::from(v.clone()))
            .collect(),
    ))
}
