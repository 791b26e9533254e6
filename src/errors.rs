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

//! # Piper Error Module
//!
//! This module defines the error types used throughout the Piper engine for
//! consistent error handling and reporting.
//!
//! ## Error Handling Philosophy
//!
//! Piper distinguishes three severities of failure:
//!
//! - **Construction faults**: syntax errors, duplicate names, and unresolved
//!   references detected while building a `Piper` instance. These are fatal
//!   and no partial instance is produced.
//! - **Request-level faults**: problems with a whole `process` call, such as
//!   an unknown pipeline name.
//! - **Cell-level faults**: failures while computing one output field of one
//!   row. These are recovered locally by the engine; the cell becomes Null
//!   and one `PiperFieldError` is recorded. Cell-level variants flow through
//!   the same `PiperError` enum so that builtin and user functions share one
//!   fault channel.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::value::PiperValueType;

/// Convenience result type used throughout Piper.
pub type Result<T> = std::result::Result<T, PiperError>;

/// Canonical error enumeration for the Piper engine.
#[derive(Clone, Debug, Error, Serialize, Deserialize)]
pub enum PiperError {
    /// DSL syntax errors, reported with the source position.
    #[error("syntax error at line {line}, column {column}: {message}")]
    Syntax {
        line: usize,
        column: usize,
        message: String,
    },

    /// A `process` call named a pipeline that does not exist.
    #[error("pipeline '{0}' is not found")]
    PipelineNotFound(String),

    /// Two pipelines in one script share a name.
    #[error("pipeline '{0}' is already defined")]
    PipelineAlreadyDefined(String),

    /// An expression referenced a field that is not in scope.
    #[error("field '{0}' not found")]
    FieldNotFound(String),

    /// A stage tried to introduce a field name that already exists.
    #[error("field '{0}' already exists")]
    FieldAlreadyExists(String),

    /// A user function collides with a builtin or another user function.
    #[error("function '{0}' already exists")]
    FunctionAlreadyDefined(String),

    /// A call expression named a function that is not registered.
    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    /// A lookup stage named a source that is not registered.
    #[error("lookup source '{0}' not found")]
    LookupSourceNotFound(String),

    /// Arguments with the given types cannot be applied to the operator.
    #[error("cannot apply '{op}' between {left} and {right}")]
    TypeMismatch {
        op: String,
        left: PiperValueType,
        right: PiperValueType,
    },

    /// A unary operator got an invalid operand type.
    #[error("cannot apply '{op}' to {operand}")]
    InvalidOperand {
        op: String,
        operand: PiperValueType,
    },

    /// A function was called with the wrong number of arguments.
    #[error("invalid argument count, expecting {expected}, got {actual}")]
    InvalidArgumentCount { expected: usize, actual: usize },

    /// A function argument had an unusable type.
    #[error("invalid type {actual} of argument {index}")]
    InvalidArgumentType {
        index: usize,
        actual: PiperValueType,
    },

    /// A value could not be cast to the requested type.
    #[error("cannot cast from {from} to {to}")]
    InvalidTypeCast {
        from: PiperValueType,
        to: PiperValueType,
    },

    /// Integer division by zero.
    #[error("division by zero")]
    DivisionByZero,

    /// Integer arithmetic left the i64 range.
    #[error("integer overflow in '{0}'")]
    ArithmeticOverflow(String),

    /// A list index was outside the list bounds.
    #[error("index {index} out of bounds, length is {length}")]
    IndexOutOfBounds { index: i64, length: usize },

    /// A string could not be parsed as JSON.
    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    /// A JSONPath query string could not be parsed.
    #[error("invalid JSONPath: {0}")]
    InvalidJsonPath(String),

    /// A string could not be parsed as the requested type.
    #[error("string '{0}' is not a valid {1}")]
    Format(String, PiperValueType),

    /// Any failure raised inside a user function or lookup source.
    #[error("{0}")]
    External(String),
}

impl PiperError {
    /// Helper to construct syntax errors with a source position.
    pub fn syntax(line: usize, column: usize, message: impl Into<String>) -> Self {
        PiperError::Syntax {
            line,
            column,
            message: message.into(),
        }
    }

    /// Helper to construct type-mismatch faults for binary operators.
    pub fn type_mismatch(
        op: impl Into<String>,
        left: PiperValueType,
        right: PiperValueType,
    ) -> Self {
        PiperError::TypeMismatch {
            op: op.into(),
            left,
            right,
        }
    }

    /// Helper to construct invalid-operand faults for unary operators.
    pub fn invalid_operand(op: impl Into<String>, operand: PiperValueType) -> Self {
        PiperError::InvalidOperand {
            op: op.into(),
            operand,
        }
    }

    /// Helper to wrap failures coming from user code.
    pub fn external(message: impl Into<String>) -> Self {
        PiperError::External(message.into())
    }
}
