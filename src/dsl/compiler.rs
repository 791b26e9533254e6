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

//! # Piper DSL Compiler Module
//!
//! Binds the parsed IR against the function and lookup registries,
//! producing immutable execution plans. Compilation walks each pipeline's
//! stages in source order with a running field layout, so every reference
//! resolves to a positional index and every name collision is caught before
//! a single row is processed.
//!
//! Faults here are construction faults: one bad pipeline fails the whole
//! script and no partial instance is produced.

use std::collections::HashMap;
use std::sync::Arc;

use crate::engine::{CompiledStage, PiperPipeline};
use crate::errors::{PiperError, Result};
use crate::expr::BoundExpr;
use crate::function::PiperFunction;
use crate::lookup::PiperLookupSource;

use super::ir::{ExprDef, PipelineDef, PiperScript, StageDef};

/// Compiles every pipeline of a script. Duplicate pipeline names fail.
pub(crate) fn compile_script(
    script: &PiperScript,
    functions: &HashMap<String, Arc<dyn PiperFunction>>,
    lookups: &HashMap<String, Arc<dyn PiperLookupSource>>,
) -> Result<HashMap<String, PiperPipeline>> {
    let mut pipelines = HashMap::new();
    for def in &script.pipelines {
        if pipelines.contains_key(&def.name) {
            return Err(PiperError::PipelineAlreadyDefined(def.name.clone()));
        }
        let compiled = compile_pipeline(def, functions, lookups)?;
        pipelines.insert(def.name.clone(), compiled);
    }
    Ok(pipelines)
}

fn compile_pipeline(
    def: &PipelineDef,
    functions: &HashMap<String, Arc<dyn PiperFunction>>,
    lookups: &HashMap<String, Arc<dyn PiperLookupSource>>,
) -> Result<PiperPipeline> {
    // The layout tracks field names by position as stages transform rows.
    let mut layout: Vec<String> = Vec::with_capacity(def.params.len());
    for param in &def.params {
        if layout.contains(&param.name) {
            return Err(PiperError::FieldAlreadyExists(param.name.clone()));
        }
        layout.push(param.name.clone());
    }

    let mut stages = Vec::with_capacity(def.stages.len());
    for stage in &def.stages {
        if let Some(compiled) = compile_stage(stage, &mut layout, functions, lookups)? {
            stages.push(compiled);
        }
    }

    Ok(PiperPipeline {
        name: def.name.clone(),
        params: def.params.clone(),
        stages,
        output_layout: layout,
    })
}

/// Compiles one stage against the current layout, updating the layout to
/// the stage's output. `project-rename` is layout-only and emits nothing.
fn compile_stage(
    stage: &StageDef,
    layout: &mut Vec<String>,
    functions: &HashMap<String, Arc<dyn PiperFunction>>,
    lookups: &HashMap<String, Arc<dyn PiperLookupSource>>,
) -> Result<Option<CompiledStage>> {
    match stage {
        StageDef::Project(assigns) => {
            let mut compiled = Vec::with_capacity(assigns.len());
            for (name, expr) in assigns {
                // Each assignment sees the fields added before it.
                let bound = compile_expr(expr, layout, functions)?;
                if layout.contains(name) {
                    return Err(PiperError::FieldAlreadyExists(name.clone()));
                }
                layout.push(name.clone());
                compiled.push((name.clone(), bound));
            }
            Ok(Some(CompiledStage::Project(compiled)))
        }
        StageDef::ProjectKeep(names) => {
            let mut indices = Vec::with_capacity(names.len());
            for name in names {
                indices.push(resolve(layout, name)?);
            }
            *layout = names.clone();
            Ok(Some(CompiledStage::Select(indices)))
        }
        StageDef::ProjectRemove(names) => {
            for name in names {
                resolve(layout, name)?;
            }
            let indices: Vec<usize> = (0..layout.len())
                .filter(|&i| !names.contains(&layout[i]))
                .collect();
            *layout = indices.iter().map(|&i| layout[i].clone()).collect();
            Ok(Some(CompiledStage::Select(indices)))
        }
        StageDef::ProjectRename(renames) => {
            for (new, old) in renames {
                let index = resolve(layout, old)?;
                if layout.contains(new) {
                    return Err(PiperError::FieldAlreadyExists(new.clone()));
                }
                layout[index] = new.clone();
            }
            Ok(None)
        }
        StageDef::Where(cond) => Ok(Some(CompiledStage::Where(compile_expr(
            cond, layout, functions,
        )?))),
        StageDef::Take(count) => Ok(Some(CompiledStage::Take(*count))),
        StageDef::Top {
            count,
            criteria,
            descending,
            nulls_first,
        } => Ok(Some(CompiledStage::Top {
            count: *count,
            criteria: compile_expr(criteria, layout, functions)?,
            descending: *descending,
            nulls_first: *nulls_first,
        })),
        StageDef::Distinct => Ok(Some(CompiledStage::Distinct)),
        StageDef::IgnoreError => Ok(Some(CompiledStage::IgnoreError)),
        StageDef::Explode(name) => Ok(Some(CompiledStage::Explode(resolve(layout, name)?))),
        StageDef::Lookup {
            fields,
            source,
            key,
        } => {
            let source = lookups
                .get(source)
                .cloned()
                .ok_or_else(|| PiperError::LookupSourceNotFound(source.clone()))?;
            let key = compile_expr(key, layout, functions)?;
            let mut source_fields = Vec::with_capacity(fields.len());
            let mut output_names = Vec::with_capacity(fields.len());
            for (output, field) in fields {
                if layout.contains(output) || output_names.contains(output) {
                    return Err(PiperError::FieldAlreadyExists(output.clone()));
                }
                output_names.push(output.clone());
                source_fields.push(field.clone());
            }
            layout.extend(output_names);
            Ok(Some(CompiledStage::Lookup {
                source,
                key,
                source_fields,
            }))
        }
    }
}

fn resolve(layout: &[String], name: &str) -> Result<usize> {
    layout
        .iter()
        .position(|n| n == name)
        .ok_or_else(|| PiperError::FieldNotFound(name.to_string()))
}

fn compile_expr(
    expr: &ExprDef,
    layout: &[String],
    functions: &HashMap<String, Arc<dyn PiperFunction>>,
) -> Result<BoundExpr> {
    Ok(match expr {
        ExprDef::FieldRef(name) => BoundExpr::Field(resolve(layout, name)?),
        ExprDef::Literal(value) => BoundExpr::Literal(value.clone()),
        ExprDef::Call(name, args) => {
            let function = functions
                .get(name)
                .cloned()
                .ok_or_else(|| PiperError::UnknownFunction(name.clone()))?;
            function.check_arity(args.len())?;
            let args = args
                .iter()
                .map(|a| compile_expr(a, layout, functions))
                .collect::<Result<Vec<_>>>()?;
            BoundExpr::Call {
                name: name.clone(),
                function,
                args,
            }
        }
        ExprDef::BinaryOp(op, left, right) => BoundExpr::Binary(
            *op,
            Box::new(compile_expr(left, layout, functions)?),
            Box::new(compile_expr(right, layout, functions)?),
        ),
        ExprDef::UnaryOp(op, inner) => {
            BoundExpr::Unary(*op, Box::new(compile_expr(inner, layout, functions)?))
        }
        ExprDef::Index(base, index) => BoundExpr::Index(
            Box::new(compile_expr(base, layout, functions)?),
            Box::new(compile_expr(index, layout, functions)?),
        ),
    })
}
