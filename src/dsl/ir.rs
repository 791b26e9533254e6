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

//! # Piper Script IR Module
//!
//! This module defines the intermediate representation produced by the DSL
//! parser. The IR is pure data: it carries no function pointers and no bound
//! field indices, which is what makes it serializable. Instance snapshots
//! are exactly a serialized `PiperScript`; restoring one recompiles it
//! against freshly supplied registries.
//!
//! The `dump` methods render the IR back into canonical script text, used by
//! `Piper::pipelines` for introspection.

use serde::{Deserialize, Serialize};

use crate::value::PiperValue;

/// A parsed script: every pipeline definition it contains, in source order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PiperScript {
    pub pipelines: Vec<PipelineDef>,
}

/// One named pipeline definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineDef {
    pub name: String,
    pub params: Vec<ParamDef>,
    pub stages: Vec<StageDef>,
}

/// A declared input parameter, with its optional type annotation.
///
/// Annotations document the expected input type; they are not enforced at
/// run time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamDef {
    pub name: String,
    pub annotation: Option<String>,
}

/// One stage of a pipeline, as written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StageDef {
    /// `project name = expr, ...` adds computed fields.
    Project(Vec<(String, ExprDef)>),
    /// `project-keep a, b` restricts the layout to the named fields.
    ProjectKeep(Vec<String>),
    /// `project-remove a, b` drops the named fields.
    ProjectRemove(Vec<String>),
    /// `project-rename new = old, ...` renames fields in place.
    ProjectRename(Vec<(String, String)>),
    /// `where expr` keeps rows whose condition is true.
    Where(ExprDef),
    /// `take n` truncates the batch to the first n rows.
    Take(usize),
    /// `top n by expr` keeps the n best rows by the criteria, sorted.
    Top {
        count: usize,
        criteria: ExprDef,
        descending: bool,
        nulls_first: bool,
    },
    /// `distinct` drops duplicate rows, keeping first occurrences.
    Distinct,
    /// `ignore-error` drops rows that have accumulated a diagnostic.
    IgnoreError,
    /// `explode f` fans a list-valued field out one row per element.
    Explode(String),
    /// `lookup out = field, ... from source on key`.
    Lookup {
        /// Output field name paired with the source field it reads.
        fields: Vec<(String, String)>,
        source: String,
        key: ExprDef,
    },
}

/// An unbound expression tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExprDef {
    FieldRef(String),
    Literal(PiperValue),
    Call(String, Vec<ExprDef>),
    BinaryOp(BinaryOp, Box<ExprDef>, Box<ExprDef>),
    UnaryOp(UnaryOp, Box<ExprDef>),
    Index(Box<ExprDef>, Box<ExprDef>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Gt => ">",
            BinaryOp::Lt => "<",
            BinaryOp::Ge => ">=",
            BinaryOp::Le => "<=",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Not,
}

impl UnaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "not ",
        }
    }
}

impl PipelineDef {
    /// Renders the definition back into canonical script text.
    pub fn dump(&self) -> String {
        let params: Vec<String> = self.params.iter().map(|p| p.dump()).collect();
        let mut out = format!("{}({})", self.name, params.join(", "));
        for stage in &self.stages {
            out.push_str("\n| ");
            out.push_str(&stage.dump());
        }
        out.push_str("\n;");
        out
    }
}

impl ParamDef {
    pub fn dump(&self) -> String {
        match &self.annotation {
            Some(ty) => format!("{} as {}", self.name, ty),
            None => self.name.clone(),
        }
    }
}

impl StageDef {
    pub fn dump(&self) -> String {
        match self {
            StageDef::Project(assigns) => {
                let inner: Vec<String> = assigns
                    .iter()
                    .map(|(name, expr)| format!("{} = {}", name, expr.dump()))
                    .collect();
                format!("project {}", inner.join(", "))
            }
            StageDef::ProjectKeep(names) => format!("project-keep {}", names.join(", ")),
            StageDef::ProjectRemove(names) => format!("project-remove {}", names.join(", ")),
            StageDef::ProjectRename(renames) => {
                let inner: Vec<String> = renames
                    .iter()
                    .map(|(new, old)| format!("{} = {}", new, old))
                    .collect();
                format!("project-rename {}", inner.join(", "))
            }
            StageDef::Where(cond) => format!("where {}", cond.dump()),
            StageDef::Take(count) => format!("take {}", count),
            StageDef::Top {
                count,
                criteria,
                descending,
                nulls_first,
            } => format!(
                "top {} by {} {} nulls {}",
                count,
                criteria.dump(),
                if *descending { "desc" } else { "asc" },
                if *nulls_first { "first" } else { "last" }
            ),
            StageDef::Distinct => "distinct".to_string(),
            StageDef::IgnoreError => "ignore-error".to_string(),
            StageDef::Explode(name) => format!("explode {}", name),
            StageDef::Lookup {
                fields,
                source,
                key,
            } => {
                let inner: Vec<String> = fields
                    .iter()
                    .map(|(out, field)| {
                        if out == field {
                            out.clone()
                        } else {
                            format!("{} = {}", out, field)
                        }
                    })
                    .collect();
                format!(
                    "lookup {} from {} on {}",
                    inner.join(", "),
                    source,
                    key.dump()
                )
            }
        }
    }
}

impl ExprDef {
    /// Renders the expression with explicit parentheses around nested binary
    /// operations, so the output reparses to the same tree.
    pub fn dump(&self) -> String {
        match self {
            ExprDef::FieldRef(name) => name.clone(),
            ExprDef::Literal(value) => value.dump(),
            ExprDef::Call(name, args) => {
                let inner: Vec<String> = args.iter().map(|a| a.dump()).collect();
                format!("{}({})", name, inner.join(", "))
            }
            ExprDef::BinaryOp(op, left, right) => format!(
                "({} {} {})",
                left.dump(),
                op.symbol(),
                right.dump()
            ),
            ExprDef::UnaryOp(op, expr) => format!("({}{})", op.symbol(), expr.dump()),
            ExprDef::Index(base, index) => format!("{}[{}]", base.dump(), index.dump()),
        }
    }
}
