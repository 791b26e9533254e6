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

//! # Piper
//!
//! Piper is an embeddable pipeline engine. It compiles a small declarative
//! script into named, reusable transformation pipelines and executes them
//! over batches of records, calling back into user-supplied functions and
//! external key-based lookup sources along the way.
//!
//! ## A Minimal Embedding
//!
//! ```rust
//! use std::collections::HashMap;
//! use piper::{Piper, PiperRecord, PiperValue};
//!
//! let piper = Piper::new(
//!     "double_it(x)\n| project y = x * 2\n;",
//!     HashMap::new(),
//!     HashMap::new(),
//! ).unwrap();
//!
//! let result = piper.process("double_it", PiperRecord::new().with("x", 21i64)).unwrap();
//! assert_eq!(result.rows[0].get("y"), Some(&PiperValue::Int(42)));
//! assert!(result.errors.is_empty());
//! ```
//!
//! ## Execution Model
//!
//! A `Piper` instance is immutable once constructed and safe to share by
//! reference across threads and tasks. Every `process` call is independent;
//! nothing carries over between calls. Row-level problems never abort a
//! batch: the affected cell becomes Null and a `PiperFieldError` describes
//! what went wrong, while the rest of the batch proceeds.
//!
//! ## Module Map
//!
//! - [`value`]: the dynamic value model and its coercion rules
//! - [`record`]: ordered records exchanged at the API boundary
//! - `dsl`: lexer, parser, IR, and compiler
//! - `expr`: bound expression evaluation
//! - [`function`]: the function calling convention and builtin library
//! - [`lookup`]: external key-based data sources
//! - [`engine`]: batch execution and error accumulation
//! - `piper`: the instance type tying it all together

pub mod engine;
pub mod errors;
pub mod function;
pub mod lookup;
pub mod record;
pub mod value;

pub(crate) mod dsl;
pub(crate) mod expr;
mod piper;

pub use engine::{PiperFieldError, PiperProcessResult};
pub use errors::{PiperError, Result};
pub use function::{
    binary_fn, quaternary_fn, sync_fn, unary_fn, FromPiperValue, IntoPiperValue, PiperFunction,
};
pub use lookup::{lookup_fn, PiperLookupSource, PiperMapSource};
pub use piper::Piper;
pub use record::{PiperRecord, PiperRecordBatch};
pub use value::{PiperValue, PiperValueType};
