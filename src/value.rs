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

//! # Piper Value Module
//!
//! This module provides the dynamic, tagged runtime value type that flows
//! through Piper pipelines, together with its coercion rules.
//!
//! ## Coercion Rules
//!
//! - Binary arithmetic with one Double operand promotes the other side from
//!   Int to Double before computing.
//! - Int op Int stays Int, including division, which truncates; an explicit
//!   `double()` cast on either operand is what turns `/` into Double
//!   division.
//! - All other cross-type coercion is explicit via `cast_to` and fails as a
//!   typed cell fault rather than an uncaught panic.

use std::collections::HashMap;
use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::errors::{PiperError, Result};

/// The type tag of a [`PiperValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PiperValueType {
    Null,
    Bool,
    Int,
    Double,
    String,
    List,
    Map,
    Bytes,
}

impl PiperValueType {
    /// True if the type participates in arithmetic promotion.
    pub fn is_numeric(&self) -> bool {
        matches!(self, PiperValueType::Int | PiperValueType::Double)
    }
}

impl Display for PiperValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PiperValueType::Null => write!(f, "null"),
            PiperValueType::Bool => write!(f, "bool"),
            PiperValueType::Int => write!(f, "int"),
            PiperValueType::Double => write!(f, "double"),
            PiperValueType::String => write!(f, "string"),
            PiperValueType::List => write!(f, "list"),
            PiperValueType::Map => write!(f, "map"),
            PiperValueType::Bytes => write!(f, "bytes"),
        }
    }
}

impl PiperValueType {
    /// Parses a type annotation as written in a pipeline parameter list.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "bool" => Some(PiperValueType::Bool),
            "int" => Some(PiperValueType::Int),
            "double" => Some(PiperValueType::Double),
            "string" => Some(PiperValueType::String),
            "list" => Some(PiperValueType::List),
            "map" => Some(PiperValueType::Map),
            "bytes" => Some(PiperValueType::Bytes),
            _ => None,
        }
    }
}

/// Dynamic runtime value carried by record fields and expression results.
///
/// Serialized untagged so records read as plain JSON. Variant order matters
/// for deserialization: Int is tried before Double so whole numbers stay
/// Int, and List before Bytes so arrays of numbers stay Lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PiperValue {
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
    List(Vec<PiperValue>),
    Map(HashMap<String, PiperValue>),
    Bytes(Vec<u8>),
}

impl Default for PiperValue {
    fn default() -> Self {
        PiperValue::Null
    }
}

impl PiperValue {
    /// Returns the type tag of this value.
    pub fn value_type(&self) -> PiperValueType {
        match self {
            PiperValue::Null => PiperValueType::Null,
            PiperValue::Bool(_) => PiperValueType::Bool,
            PiperValue::Int(_) => PiperValueType::Int,
            PiperValue::Double(_) => PiperValueType::Double,
            PiperValue::String(_) => PiperValueType::String,
            PiperValue::List(_) => PiperValueType::List,
            PiperValue::Map(_) => PiperValueType::Map,
            PiperValue::Bytes(_) => PiperValueType::Bytes,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, PiperValue::Null)
    }

    /// Extracts an Int, without implicit conversion.
    pub fn get_int(&self) -> Result<i64> {
        match self {
            PiperValue::Int(v) => Ok(*v),
            other => Err(PiperError::InvalidTypeCast {
                from: other.value_type(),
                to: PiperValueType::Int,
            }),
        }
    }

    /// Extracts a Double, promoting Int. This is the numeric argument rule
    /// used by the builtin library.
    pub fn get_double(&self) -> Result<f64> {
        match self {
            PiperValue::Int(v) => Ok(*v as f64),
            PiperValue::Double(v) => Ok(*v),
            other => Err(PiperError::InvalidTypeCast {
                from: other.value_type(),
                to: PiperValueType::Double,
            }),
        }
    }

    pub fn get_bool(&self) -> Result<bool> {
        match self {
            PiperValue::Bool(v) => Ok(*v),
            other => Err(PiperError::InvalidTypeCast {
                from: other.value_type(),
                to: PiperValueType::Bool,
            }),
        }
    }

    pub fn get_string(&self) -> Result<&str> {
        match self {
            PiperValue::String(v) => Ok(v.as_str()),
            other => Err(PiperError::InvalidTypeCast {
                from: other.value_type(),
                to: PiperValueType::String,
            }),
        }
    }

    pub fn get_list(&self) -> Result<&[PiperValue]> {
        match self {
            PiperValue::List(v) => Ok(v.as_slice()),
            other => Err(PiperError::InvalidTypeCast {
                from: other.value_type(),
                to: PiperValueType::List,
            }),
        }
    }

    pub fn get_map(&self) -> Result<&HashMap<String, PiperValue>> {
        match self {
            PiperValue::Map(v) => Ok(v),
            other => Err(PiperError::InvalidTypeCast {
                from: other.value_type(),
                to: PiperValueType::Map,
            }),
        }
    }

    /// Casts the value to the requested type, using the explicit coercion
    /// rules of the builtin cast functions.
    pub fn cast_to(self, target: PiperValueType) -> Result<PiperValue> {
        let from = self.value_type();
        if from == target {
            return Ok(self);
        }
        match (self, target) {
            (v, PiperValueType::String) => Ok(PiperValue::String(v.render())),
            (PiperValue::Int(v), PiperValueType::Double) => Ok(PiperValue::Double(v as f64)),
            (PiperValue::Double(v), PiperValueType::Int) => Ok(PiperValue::Int(v as i64)),
            (PiperValue::Bool(v), PiperValueType::Int) => Ok(PiperValue::Int(v as i64)),
            (PiperValue::String(s), PiperValueType::Int) => s
                .trim()
                .parse::<i64>()
                .map(PiperValue::Int)
                .map_err(|_| PiperError::Format(s, PiperValueType::Int)),
            (PiperValue::String(s), PiperValueType::Double) => s
                .trim()
                .parse::<f64>()
                .map(PiperValue::Double)
                .map_err(|_| PiperError::Format(s, PiperValueType::Double)),
            (PiperValue::String(s), PiperValueType::Bool) => match s.trim() {
                "true" => Ok(PiperValue::Bool(true)),
                "false" => Ok(PiperValue::Bool(false)),
                _ => Err(PiperError::Format(s, PiperValueType::Bool)),
            },
            (PiperValue::Int(v), PiperValueType::Bool) => Ok(PiperValue::Bool(v != 0)),
            (_, to) => Err(PiperError::InvalidTypeCast { from, to }),
        }
    }

    /// Plain string rendering used by the `string()` cast and by lookup key
    /// normalization. Unlike `dump`, strings are not quoted.
    pub fn render(&self) -> String {
        match self {
            PiperValue::Null => "null".to_string(),
            PiperValue::Bool(v) => v.to_string(),
            PiperValue::Int(v) => v.to_string(),
            PiperValue::Double(v) => v.to_string(),
            PiperValue::String(v) => v.clone(),
            other => other.dump(),
        }
    }

    /// Renders the value as a DSL literal.
    pub fn dump(&self) -> String {
        match self {
            PiperValue::Null => "null".to_string(),
            PiperValue::Bool(v) => v.to_string(),
            PiperValue::Int(v) => v.to_string(),
            PiperValue::Double(v) => v.to_string(),
            PiperValue::String(v) => format!("{:?}", v),
            PiperValue::List(items) => {
                let inner: Vec<String> = items.iter().map(|v| v.dump()).collect();
                format!("[{}]", inner.join(", "))
            }
            PiperValue::Map(map) => {
                let mut inner: Vec<String> =
                    map.iter().map(|(k, v)| format!("{:?}: {}", k, v.dump())).collect();
                inner.sort();
                format!("{{{}}}", inner.join(", "))
            }
            PiperValue::Bytes(bytes) => format!("bytes[{}]", bytes.len()),
        }
    }
}

impl From<()> for PiperValue {
    fn from(_: ()) -> Self {
        PiperValue::Null
    }
}

impl From<bool> for PiperValue {
    fn from(v: bool) -> Self {
        PiperValue::Bool(v)
    }
}

impl From<i32> for PiperValue {
    fn from(v: i32) -> Self {
        PiperValue::Int(v as i64)
    }
}

impl From<i64> for PiperValue {
    fn from(v: i64) -> Self {
        PiperValue::Int(v)
    }
}

impl From<f64> for PiperValue {
    fn from(v: f64) -> Self {
        PiperValue::Double(v)
    }
}

impl From<&str> for PiperValue {
    fn from(v: &str) -> Self {
        PiperValue::String(v.to_string())
    }
}

impl From<String> for PiperValue {
    fn from(v: String) -> Self {
        PiperValue::String(v)
    }
}

impl From<Vec<PiperValue>> for PiperValue {
    fn from(v: Vec<PiperValue>) -> Self {
        PiperValue::List(v)
    }
}

impl From<HashMap<String, PiperValue>> for PiperValue {
    fn from(v: HashMap<String, PiperValue>) -> Self {
        PiperValue::Map(v)
    }
}

impl<T> From<Option<T>> for PiperValue
where
    T: Into<PiperValue>,
{
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => PiperValue::Null,
        }
    }
}

impl FromIterator<PiperValue> for PiperValue {
    fn from_iter<T: IntoIterator<Item = PiperValue>>(iter: T) -> Self {
        PiperValue::List(iter.into_iter().collect())
    }
}

impl From<serde_json::Value> for PiperValue {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => PiperValue::Null,
            serde_json::Value::Bool(b) => PiperValue::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    PiperValue::Int(i)
                } else {
                    PiperValue::Double(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => PiperValue::String(s),
            serde_json::Value::Array(items) => {
                PiperValue::List(items.into_iter().map(PiperValue::from).collect())
            }
            serde_json::Value::Object(map) => PiperValue::Map(
                map.into_iter().map(|(k, v)| (k, PiperValue::from(v))).collect(),
            ),
        }
    }
}

impl From<PiperValue> for serde_json::Value {
    fn from(v: PiperValue) -> Self {
        match v {
            PiperValue::Null => serde_json::Value::Null,
            PiperValue::Bool(b) => serde_json::Value::Bool(b),
            PiperValue::Int(i) => serde_json::Value::from(i),
            PiperValue::Double(d) => {
                serde_json::Number::from_f64(d).map(serde_json::Value::Number).unwrap_or(serde_json::Value::Null)
            }
            PiperValue::String(s) => serde_json::Value::String(s),
            PiperValue::List(items) => {
                serde_json::Value::Array(items.into_iter().map(serde_json::Value::from).collect())
            }
            PiperValue::Map(map) => serde_json::Value::Object(
                map.into_iter().map(|(k, v)| (k, serde_json::Value::from(v))).collect(),
            ),
            PiperValue::Bytes(bytes) => {
                serde_json::Value::Array(bytes.into_iter().map(serde_json::Value::from).collect())
            }
        }
    }
}
