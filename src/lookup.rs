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

//! # Piper Lookup Module
//!
//! External key-based data sources referenced by `lookup` stages. A source
//! answers one key with zero or more rows; the engine turns that into row
//! elimination, extension, or fan-out. Sources must tolerate concurrent
//! calls, one `Piper` instance drives them from many tasks at once.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::errors::Result;
use crate::record::PiperRecord;
use crate::value::PiperValue;

/// The contract a `lookup` stage's data source fulfills.
#[async_trait]
pub trait PiperLookupSource: Send + Sync + std::fmt::Debug {
    /// Resolves one key into matching rows. Each row is positionally aligned
    /// to `fields`; a field the source does not have should be Null.
    ///
    /// Returning an empty vector eliminates the probing record. An `Err` is
    /// treated the same way, never as a batch failure.
    async fn lookup(&self, key: &PiperValue, fields: &[String]) -> Result<Vec<Vec<PiperValue>>>;
}

struct FnSource<F> {
    f: F,
}

impl<F> std::fmt::Debug for FnSource<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("FnSource")
    }
}

#[async_trait]
impl<F> PiperLookupSource for FnSource<F>
where
    F: Fn(&PiperValue, &[String]) -> Result<Vec<Vec<PiperValue>>> + Send + Sync,
{
    async fn lookup(&self, key: &PiperValue, fields: &[String]) -> Result<Vec<Vec<PiperValue>>> {
        (self.f)(key, fields)
    }
}

/// Adapts a synchronous closure into a lookup source. The closure is invoked
/// directly, with no suspension, so it must not block for long.
pub fn lookup_fn<F>(f: F) -> impl PiperLookupSource
where
    F: Fn(&PiperValue, &[String]) -> Result<Vec<Vec<PiperValue>>> + Send + Sync,
{
    FnSource { f }
}

/// In-memory lookup source backed by a string-keyed table.
///
/// Keys are matched by their plain string rendering, so an Int key `1` in a
/// record matches a row inserted under `"1"`. Multiple rows may share one
/// key; they come back in insertion order, which drives fan-out order.
#[derive(Debug, Clone, Default)]
pub struct PiperMapSource {
    rows: HashMap<String, Vec<PiperRecord>>,
}

impl PiperMapSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one row under the given key.
    pub fn insert(&mut self, key: impl Into<String>, row: PiperRecord) {
        self.rows.entry(key.into()).or_default().push(row);
    }

    /// Builder-style `insert`.
    pub fn with(mut self, key: impl Into<String>, row: PiperRecord) -> Self {
        self.insert(key, row);
        self
    }
}

#[async_trait]
impl PiperLookupSource for PiperMapSource {
    async fn lookup(&self, key: &PiperValue, fields: &[String]) -> Result<Vec<Vec<PiperValue>>> {
        let rows = match self.rows.get(&key.render()) {
            Some(rows) => rows,
            None => return Ok(Vec::new()),
        };
        Ok(rows
            .iter()
            .map(|row| {
                fields
                    .iter()
                    .map(|field| row.get(field).cloned().unwrap_or(PiperValue::Null))
                    .collect()
            })
            .collect())
    }
}
