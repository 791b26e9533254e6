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

//! # Piper Record Module
//!
//! This module defines the record type exchanged at the API boundary of the
//! Piper engine. A record is an ordered field-name to value map; field order
//! is preserved from insertion through serialization so that output rows read
//! in the layout their pipeline produced.
//!
//! Inside the engine rows travel as positional value vectors; records only
//! exist at the edges, when a batch enters `process` and when result rows are
//! handed back.

use std::collections::HashMap;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::value::PiperValue;

/// One input or output row, with insertion-ordered fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PiperRecord {
    fields: Vec<(String, PiperValue)>,
}

/// A batch of records processed by one `process` call.
pub type PiperRecordBatch = Vec<PiperRecord>;

impl PiperRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a field, replacing an existing one in place so the layout does
    /// not shift.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<PiperValue>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
    }

    /// Builder-style `set`, convenient in tests and embedding code.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<PiperValue>) -> Self {
        self.set(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&PiperValue> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Field names in layout order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PiperValue)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Consumes the record into its ordered field list.
    pub fn into_fields(self) -> Vec<(String, PiperValue)> {
        self.fields
    }
}

impl From<Vec<(String, PiperValue)>> for PiperRecord {
    fn from(fields: Vec<(String, PiperValue)>) -> Self {
        let mut record = PiperRecord::new();
        for (name, value) in fields {
            record.set(name, value);
        }
        record
    }
}

impl From<HashMap<String, PiperValue>> for PiperRecord {
    fn from(map: HashMap<String, PiperValue>) -> Self {
        let mut fields: Vec<(String, PiperValue)> = map.into_iter().collect();
        fields.sort_by(|a, b| a.0.cmp(&b.0));
        PiperRecord { fields }
    }
}

impl From<PiperRecord> for PiperRecordBatch {
    fn from(record: PiperRecord) -> Self {
        vec![record]
    }
}

impl FromIterator<(String, PiperValue)> for PiperRecord {
    fn from_iter<T: IntoIterator<Item = (String, PiperValue)>>(iter: T) -> Self {
        let mut record = PiperRecord::new();
        for (name, value) in iter {
            record.set(name, value);
        }
        record
    }
}

// Serialized as a JSON object; a Vec-backed map keeps field order where
// serde_json's default map type would not.
impl Serialize for PiperRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for PiperRecord {
    fn deserialize<D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        struct RecordVisitor;

        impl<'de> Visitor<'de> for RecordVisitor {
            type Value = PiperRecord;

            fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("a map of field names to values")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut access: A,
            ) -> std::result::Result<Self::Value, A::Error> {
                let mut record = PiperRecord::new();
                while let Some((name, value)) = access.next_entry::<String, PiperValue>()? {
                    record.set(name, value);
                }
                Ok(record)
            }
        }

        deserializer.deserialize_map(RecordVisitor)
    }
}
