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

//! # Piper Instance Module
//!
//! The `Piper` type ties everything together: it compiles a script against
//! the caller's lookup sources and functions, then serves `process` calls
//! for as long as it lives. An instance is immutable after construction and
//! `Send + Sync`, so one instance behind an `Arc` serves any number of
//! concurrent tasks.
//!
//! ## Dual Entry Points
//!
//! `process` and `process_async` share one implementation; the synchronous
//! entry blocks the calling thread on the same future the asynchronous one
//! awaits. Their results are identical by construction.
//!
//! ## Snapshots
//!
//! A snapshot is the script IR serialized as JSON bytes. Functions and
//! lookup sources are live handles and cannot travel with it; restoring a
//! snapshot takes fresh registries and recompiles, applying the same
//! construction-time validation as `new`.

use std::collections::HashMap;
use std::sync::Arc;

use crate::dsl::compiler::compile_script;
use crate::dsl::ir::PiperScript;
use crate::dsl::parser::parse_script;
use crate::engine::{PiperPipeline, PiperProcessResult};
use crate::errors::{PiperError, Result};
use crate::function::{build_registry, PiperFunction};
use crate::lookup::PiperLookupSource;
use crate::record::PiperRecordBatch;

/// A compiled, immutable pipeline engine instance.
pub struct Piper {
    script: PiperScript,
    pipelines: HashMap<String, PiperPipeline>,
}

impl Piper {
    /// Compiles a script against the given lookup sources and user
    /// functions. Any syntax error, name collision, or unresolved reference
    /// fails the whole construction; there is no partial instance.
    pub fn new(
        script: &str,
        lookups: HashMap<String, Arc<dyn PiperLookupSource>>,
        functions: HashMap<String, Arc<dyn PiperFunction>>,
    ) -> Result<Self> {
        let parsed = parse_script(script)?;
        Self::from_script(parsed, lookups, functions)
    }

    /// Restores an instance from `snapshot` bytes, recompiling against
    /// fresh registries.
    pub fn restore(
        snapshot: &[u8],
        lookups: HashMap<String, Arc<dyn PiperLookupSource>>,
        functions: HashMap<String, Arc<dyn PiperFunction>>,
    ) -> Result<Self> {
        let script: PiperScript = serde_json::from_slice(snapshot)
            .map_err(|e| PiperError::InvalidJson(e.to_string()))?;
        Self::from_script(script, lookups, functions)
    }

    fn from_script(
        script: PiperScript,
        lookups: HashMap<String, Arc<dyn PiperLookupSource>>,
        functions: HashMap<String, Arc<dyn PiperFunction>>,
    ) -> Result<Self> {
        let registry = build_registry(functions)?;
        let pipelines = compile_script(&script, &registry, &lookups)?;
        log::debug!(
            "piper ready: {} pipelines, {} functions, {} lookup sources",
            pipelines.len(),
            registry.len(),
            lookups.len()
        );
        Ok(Self { script, pipelines })
    }

    /// Runs one pipeline over a batch, awaiting lookup sources and
    /// suspend-capable functions as needed.
    pub async fn process_async(
        &self,
        pipeline: &str,
        input: impl Into<PiperRecordBatch>,
    ) -> Result<PiperProcessResult> {
        let pipeline = self.pipelines.get(pipeline).ok_or_else(|| {
            log::warn!("process called for unknown pipeline '{}'", pipeline);
            PiperError::PipelineNotFound(pipeline.to_string())
        })?;
        pipeline.run(input.into()).await
    }

    /// Synchronous twin of [`process_async`](Self::process_async): blocks
    /// the calling thread on the same future.
    pub fn process(
        &self,
        pipeline: &str,
        input: impl Into<PiperRecordBatch>,
    ) -> Result<PiperProcessResult> {
        futures::executor::block_on(self.process_async(pipeline, input))
    }

    /// Serializes the compiled script as pure data. See the module docs for
    /// what a snapshot does and does not contain.
    pub fn snapshot(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(&self.script).map_err(|e| PiperError::external(e.to_string()))
    }

    /// Names and canonical definitions of every pipeline, for
    /// introspection.
    pub fn pipelines(&self) -> HashMap<String, String> {
        self.script
            .pipelines
            .iter()
            .map(|def| (def.name.clone(), def.dump()))
            .collect()
    }
}

impl std::fmt::Debug for Piper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.pipelines.values().map(|p| p.name.as_str()).collect();
        names.sort_unstable();
        f.debug_struct("Piper").field("pipelines", &names).finish()
    }
}
