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

//! # Piper JSONPath Module
//!
//! The JSONPath subset behind `get_json_object` and `get_json_array`:
//!
//! - `$` root
//! - `.name` object member
//! - `[i]` array index
//! - `[*]` array wildcard
//! - `[?(@.field=='value')]` and `[?(@.field==123)]` array filters
//!
//! Queries never fault on missing data; they return zero matches. Only a
//! malformed path is an error.

use serde_json::Value;

use crate::errors::{PiperError, Result};

#[derive(Debug, Clone, PartialEq)]
enum PathStep {
    Field(String),
    Index(usize),
    Wildcard,
    Filter { field: String, expected: Value },
}

/// A parsed JSONPath query.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct JsonPath {
    steps: Vec<PathStep>,
}

impl JsonPath {
    /// Parses the query string, rejecting anything outside the subset.
    pub(crate) fn parse(path: &str) -> Result<Self> {
        let bad = |msg: &str| PiperError::InvalidJsonPath(format!("'{}': {}", path, msg));
        let mut chars = path.chars().peekable();
        if chars.next() != Some('$') {
            return Err(bad("must start with '$'"));
        }
        let mut steps = Vec::new();
        while let Some(c) = chars.next() {
            match c {
                '.' => {
                    let mut name = String::new();
                    while let Some(&c) = chars.peek() {
                        if c == '.' || c == '[' {
                            break;
                        }
                        name.push(c);
                        chars.next();
                    }
                    if name.is_empty() {
                        return Err(bad("empty member name"));
                    }
                    steps.push(PathStep::Field(name));
                }
                '[' => {
                    let mut inner = String::new();
                    let mut closed = false;
                    for c in chars.by_ref() {
                        if c == ']' {
                            closed = true;
                            break;
                        }
                        inner.push(c);
                    }
                    if !closed {
                        return Err(bad("unclosed '['"));
                    }
                    steps.push(Self::parse_bracket(inner.trim(), &bad)?);
                }
                _ => return Err(bad("expected '.' or '['")),
            }
        }
        Ok(JsonPath { steps })
    }

    fn parse_bracket(inner: &str, bad: &impl Fn(&str) -> PiperError) -> Result<PathStep> {
        if inner == "*" {
            return Ok(PathStep::Wildcard);
        }
        if let Ok(index) = inner.parse::<usize>() {
            return Ok(PathStep::Index(index));
        }
        // ?(@.field=='value') or ?(@.field==123)
        let filter = inner
            .strip_prefix("?(@.")
            .and_then(|s| s.strip_suffix(')'))
            .ok_or_else(|| bad("expected index, '*' or filter"))?;
        let (field, value) = filter
            .split_once("==")
            .ok_or_else(|| bad("filter must compare with '=='"))?;
        let field = field.trim();
        let value = value.trim();
        if field.is_empty() {
            return Err(bad("empty filter field"));
        }
        let expected = if let Some(text) = value
            .strip_prefix('\'')
            .and_then(|s| s.strip_suffix('\''))
        {
            Value::String(text.to_string())
        } else if let Ok(int) = value.parse::<i64>() {
            Value::from(int)
        } else if let Ok(num) = value.parse::<f64>() {
            Value::from(num)
        } else {
            return Err(bad("filter value must be a 'string' or a number"));
        };
        Ok(PathStep::Filter {
            field: field.to_string(),
            expected,
        })
    }

    /// Runs the query, returning every matching node in document order.
    pub(crate) fn query<'a>(&self, root: &'a Value) -> Vec<&'a Value> {
        let mut current = vec![root];
        for step in &self.steps {
            let mut next = Vec::new();
            for node in current {
                match step {
                    PathStep::Field(name) => {
                        if let Some(v) = node.get(name.as_str()) {
                            next.push(v);
                        }
                    }
                    PathStep::Index(index) => {
                        if let Some(v) = node.get(*index) {
                            next.push(v);
                        }
                    }
                    PathStep::Wildcard => {
                        if let Some(items) = node.as_array() {
                            next.extend(items.iter());
                        }
                    }
                    PathStep::Filter { field, expected } => {
                        if let Some(items) = node.as_array() {
                            next.extend(
                                items.iter().filter(|item| item.get(field) == Some(expected)),
                            );
                        }
                    }
                }
            }
            current = next;
        }
        current
    }
}
