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

//! # Piper Execution Engine Module
//!
//! Runs compiled pipelines over batches. Rows travel as positional value
//! vectors; field names only exist at the API boundary, where input records
//! are bound to declared params and output rows are rebuilt as records.
//!
//! ## Error Accumulation
//!
//! Each in-flight row carries its own diagnostics. A cell fault nulls the
//! one output field and appends a diagnostic to that row; the diagnostic
//! then travels with the row through fan-out and elimination, so the final
//! `row_index` always points at a row that actually exists in the output.
//! Diagnostics of eliminated rows are dropped with them. Diagnostics
//! outlive the removal of their field: they describe a computation, not the
//! surviving layout.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::dsl::ir::ParamDef;
use crate::errors::Result;
use crate::expr::BoundExpr;
use crate::lookup::PiperLookupSource;
use crate::record::{PiperRecord, PiperRecordBatch};
use crate::value::PiperValue;

/// One cell-level diagnostic in a process result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PiperFieldError {
    /// Pipeline that produced the diagnostic.
    pub pipeline: String,
    /// Index of the affected row in the returned `rows`.
    pub row_index: usize,
    /// Output field that faulted.
    pub field: String,
    /// Human-readable fault description.
    pub message: String,
}

/// The outcome of one `process` call: surviving rows plus every cell-level
/// diagnostic gathered along the way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PiperProcessResult {
    pub rows: Vec<PiperRecord>,
    pub errors: Vec<PiperFieldError>,
}

/// A compiled stage. Field resolution already happened; stages address the
/// row positionally.
pub(crate) enum CompiledStage {
    /// Appends one computed value per assignment. Names are kept for
    /// diagnostics.
    Project(Vec<(String, BoundExpr)>),
    /// Rebuilds the row from the given indices, in order. Compiled from
    /// both `project-keep` and `project-remove`.
    Select(Vec<usize>),
    /// Keeps rows whose condition evaluates to true. A fault or a non-bool
    /// drops the row.
    Where(BoundExpr),
    /// Truncates the batch.
    Take(usize),
    /// Keeps the best rows by a criteria expression, sorted. Rows whose
    /// criteria is Null, faults, or has no ordering sit in the null bucket.
    Top {
        count: usize,
        criteria: BoundExpr,
        descending: bool,
        nulls_first: bool,
    },
    /// Drops duplicate rows, keeping first occurrences.
    Distinct,
    /// Drops rows that have accumulated a diagnostic.
    IgnoreError,
    /// One output row per element of the list at the index. Null, a
    /// non-list value, or an empty list yields zero rows.
    Explode(usize),
    /// Key-based join against an external source. Appends one value per
    /// requested field; the row multiplies by the number of source rows.
    /// Output names live in the pipeline's final layout.
    Lookup {
        source: Arc<dyn PiperLookupSource>,
        key: BoundExpr,
        source_fields: Vec<String>,
    },
}

/// One row in flight, with the diagnostics it has accumulated.
#[derive(Debug, Clone)]
struct FlowRow {
    values: Vec<PiperValue>,
    errors: Vec<(String, String)>,
}

/// A fully compiled pipeline, immutable once built.
pub(crate) struct PiperPipeline {
    pub(crate) name: String,
    pub(crate) params: Vec<ParamDef>,
    pub(crate) stages: Vec<CompiledStage>,
    /// Field names of the final row layout.
    pub(crate) output_layout: Vec<String>,
}

impl PiperPipeline {
    /// Runs the pipeline over a batch. Input rows are processed in order
    /// and fan-out preserves source order, so output ordering is
    /// deterministic.
    pub(crate) async fn run(&self, input: PiperRecordBatch) -> Result<PiperProcessResult> {
        let mut rows: Vec<FlowRow> = input.into_iter().map(|r| self.bind_input(r)).collect();

        for stage in &self.stages {
            rows = self.run_stage(stage, rows).await?;
        }

        let mut records = Vec::with_capacity(rows.len());
        let mut errors = Vec::new();
        for (row_index, row) in rows.into_iter().enumerate() {
            for (field, message) in row.errors {
                errors.push(PiperFieldError {
                    pipeline: self.name.clone(),
                    row_index,
                    field,
                    message,
                });
            }
            records.push(
                self.output_layout
                    .iter()
                    .cloned()
                    .zip(row.values)
                    .collect::<PiperRecord>(),
            );
        }
        Ok(PiperProcessResult {
            rows: records,
            errors,
        })
    }

    /// Binds an input record to the declared params by name. Missing params
    /// read as Null; undeclared fields are ignored.
    fn bind_input(&self, record: PiperRecord) -> FlowRow {
        let values = self
            .params
            .iter()
            .map(|p| record.get(&p.name).cloned().unwrap_or(PiperValue::Null))
            .collect();
        FlowRow {
            values,
            errors: Vec::new(),
        }
    }

    async fn run_stage(&self, stage: &CompiledStage, rows: Vec<FlowRow>) -> Result<Vec<FlowRow>> {
        match stage {
            CompiledStage::Project(assigns) => {
                let mut out = Vec::with_capacity(rows.len());
                for mut row in rows {
                    for (name, expr) in assigns {
                        // Assignments see the fields added before them.
                        match expr.eval(&row.values).await {
                            Ok(value) => row.values.push(value),
                            Err(fault) => {
                                row.values.push(PiperValue::Null);
                                row.errors.push((name.clone(), fault.to_string()));
                            }
                        }
                    }
                    out.push(row);
                }
                Ok(out)
            }
            CompiledStage::Select(indices) => Ok(rows
                .into_iter()
                .map(|mut row| {
                    row.values = indices.iter().map(|&i| row.values[i].clone()).collect();
                    row
                })
                .collect()),
            CompiledStage::Where(cond) => {
                let mut out = Vec::with_capacity(rows.len());
                for row in rows {
                    if let Ok(PiperValue::Bool(true)) = cond.eval(&row.values).await {
                        out.push(row);
                    }
                }
                Ok(out)
            }
            CompiledStage::Take(count) => {
                let mut rows = rows;
                rows.truncate(*count);
                Ok(rows)
            }
            CompiledStage::Top {
                count,
                criteria,
                descending,
                nulls_first,
            } => {
                let mut keyed = Vec::new();
                let mut null_bucket = Vec::new();
                for row in rows {
                    match criteria.eval(&row.values).await {
                        Ok(key) if sort_rank(&key).is_some() => keyed.push((key, row)),
                        // Faults sort with nulls, like the nulls they become.
                        _ => null_bucket.push(row),
                    }
                }
                // Stable sort keeps input order among ties.
                keyed.sort_by(|(a, _), (b, _)| {
                    let ordering = sort_cmp(a, b);
                    if *descending {
                        ordering.reverse()
                    } else {
                        ordering
                    }
                });
                let sorted = keyed.into_iter().map(|(_, row)| row);
                let mut out: Vec<FlowRow> = if *nulls_first {
                    null_bucket.into_iter().chain(sorted).collect()
                } else {
                    sorted.chain(null_bucket).collect()
                };
                out.truncate(*count);
                Ok(out)
            }
            CompiledStage::Distinct => {
                let mut seen = std::collections::HashSet::new();
                Ok(rows
                    .into_iter()
                    .filter(|row| {
                        let key: Vec<String> = row.values.iter().map(|v| v.dump()).collect();
                        seen.insert(key)
                    })
                    .collect())
            }
            CompiledStage::IgnoreError => {
                Ok(rows.into_iter().filter(|row| row.errors.is_empty()).collect())
            }
            CompiledStage::Explode(index) => {
                let mut out = Vec::new();
                for row in rows {
                    if let PiperValue::List(items) = &row.values[*index] {
                        for item in items {
                            let mut fanned = row.clone();
                            fanned.values[*index] = item.clone();
                            out.push(fanned);
                        }
                    }
                }
                Ok(out)
            }
            CompiledStage::Lookup {
                source,
                key,
                source_fields,
            } => {
                let mut out = Vec::new();
                for row in rows {
                    // A key fault eliminates the row, same as zero matches.
                    let key_value = match key.eval(&row.values).await {
                        Ok(v) => v,
                        Err(_) => continue,
                    };
                    let matches = match source.lookup(&key_value, source_fields).await {
                        Ok(matches) => matches,
                        Err(fault) => {
                            log::warn!(
                                "pipeline {}: lookup source failed for key {}: {}",
                                self.name,
                                key_value.dump(),
                                fault
                            );
                            continue;
                        }
                    };
                    for mut matched in matches {
                        matched.resize(source_fields.len(), PiperValue::Null);
                        let mut fanned = row.clone();
                        fanned.values.extend(matched);
                        out.push(fanned);
                    }
                }
                Ok(out)
            }
        }
    }
}

/// Sortable categories for `top` criteria: bools, numbers, strings.
/// Everything else lands in the null bucket.
fn sort_rank(value: &PiperValue) -> Option<u8> {
    match value {
        PiperValue::Bool(_) => Some(0),
        PiperValue::Int(_) | PiperValue::Double(_) => Some(1),
        PiperValue::String(_) => Some(2),
        _ => None,
    }
}

/// Ascending order over sortable criteria. Categories sort by rank first;
/// within numerics, ints and doubles compare promoted, with NaN tying.
fn sort_cmp(a: &PiperValue, b: &PiperValue) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    match (sort_rank(a), sort_rank(b)) {
        (Some(ra), Some(rb)) if ra != rb => ra.cmp(&rb),
        _ => match (a, b) {
            (PiperValue::Bool(x), PiperValue::Bool(y)) => x.cmp(y),
            (PiperValue::Int(x), PiperValue::Int(y)) => x.cmp(y),
            (PiperValue::String(x), PiperValue::String(y)) => x.cmp(y),
            (x, y) => {
                let promote = |v: &PiperValue| match v {
                    PiperValue::Int(n) => *n as f64,
                    PiperValue::Double(n) => *n,
                    _ => f64::NAN,
                };
                promote(x).partial_cmp(&promote(y)).unwrap_or(Ordering::Equal)
            }
        },
    }
}
