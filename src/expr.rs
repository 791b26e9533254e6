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

//! # Piper Bound Expression Module
//!
//! Expressions after compilation: field references are positional indices
//! into the row, call targets are resolved function handles. Evaluation is a
//! boxed-future recursion so user functions and lookup key expressions may
//! suspend; builtins and sync functions complete without yielding.
//!
//! A fault anywhere in the tree propagates to the whole expression. The
//! engine decides what a fault means for the row; this module only computes.

use std::sync::Arc;

use futures::future::BoxFuture;

use crate::dsl::ir::{BinaryOp, UnaryOp};
use crate::errors::{PiperError, Result};
use crate::function::PiperFunction;
use crate::value::PiperValue;

/// A compiled expression, bound to a stage's input row layout.
pub(crate) enum BoundExpr {
    Field(usize),
    Literal(PiperValue),
    Call {
        name: String,
        function: Arc<dyn PiperFunction>,
        args: Vec<BoundExpr>,
    },
    Binary(BinaryOp, Box<BoundExpr>, Box<BoundExpr>),
    Unary(UnaryOp, Box<BoundExpr>),
    Index(Box<BoundExpr>, Box<BoundExpr>),
}

impl std::fmt::Debug for BoundExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BoundExpr::Field(index) => write!(f, "Field({index})"),
            BoundExpr::Literal(value) => write!(f, "Literal({})", value.dump()),
            BoundExpr::Call { name, args, .. } => {
                f.debug_struct("Call").field("name", name).field("args", args).finish()
            }
            BoundExpr::Binary(op, left, right) => {
                f.debug_tuple("Binary").field(&op.symbol()).field(left).field(right).finish()
            }
            BoundExpr::Unary(op, expr) => {
                f.debug_tuple("Unary").field(&op.symbol()).field(expr).finish()
            }
            BoundExpr::Index(base, index) => {
                f.debug_tuple("Index").field(base).field(index).finish()
            }
        }
    }
}

impl BoundExpr {
    /// Evaluates against one positional row.
    pub(crate) fn eval<'a>(&'a self, row: &'a [PiperValue]) -> BoxFuture<'a, Result<PiperValue>> {
        Box::pin(async move {
            match self {
                BoundExpr::Field(index) => Ok(row[*index].clone()),
                BoundExpr::Literal(value) => Ok(value.clone()),
                BoundExpr::Call {
                    function, args, ..
                } => {
                    // Arguments are eager, left to right.
                    let mut values = Vec::with_capacity(args.len());
                    for arg in args {
                        values.push(arg.eval(row).await?);
                    }
                    function.eval(values).await
                }
                BoundExpr::Binary(op, left, right) => match op {
                    // Logic short-circuits; the right side of a decided
                    // expression is never evaluated.
                    BinaryOp::And => {
                        if !expect_bool("and", left.eval(row).await?)? {
                            return Ok(PiperValue::Bool(false));
                        }
                        Ok(PiperValue::Bool(expect_bool("and", right.eval(row).await?)?))
                    }
                    BinaryOp::Or => {
                        if expect_bool("or", left.eval(row).await?)? {
                            return Ok(PiperValue::Bool(true));
                        }
                        Ok(PiperValue::Bool(expect_bool("or", right.eval(row).await?)?))
                    }
                    _ => {
                        let left = left.eval(row).await?;
                        let right = right.eval(row).await?;
                        apply_binary(*op, left, right)
                    }
                },
                BoundExpr::Unary(op, expr) => {
                    let value = expr.eval(row).await?;
                    apply_unary(*op, value)
                }
                BoundExpr::Index(base, index) => {
                    let base = base.eval(row).await?;
                    let index = index.eval(row).await?;
                    apply_index(base, index)
                }
            }
        })
    }
}

fn expect_bool(op: &str, value: PiperValue) -> Result<bool> {
    match value {
        PiperValue::Bool(v) => Ok(v),
        other => Err(PiperError::invalid_operand(op, other.value_type())),
    }
}

/// Int arithmetic is checked; leaving the i64 range is a cell fault, not a
/// panic.
fn int_op(op: BinaryOp, result: Option<i64>) -> Result<PiperValue> {
    result
        .map(PiperValue::Int)
        .ok_or_else(|| PiperError::ArithmeticOverflow(op.symbol().to_string()))
}

fn apply_binary(op: BinaryOp, left: PiperValue, right: PiperValue) -> Result<PiperValue> {
    use PiperValue::*;
    match op {
        BinaryOp::Add => match (left, right) {
            (Int(a), Int(b)) => int_op(op, a.checked_add(b)),
            (String(a), String(b)) => Ok(String(a + &b)),
            (List(mut a), List(b)) => {
                a.extend(b);
                Ok(List(a))
            }
            (l, r) => numeric_op(op, l, r, |a, b| a + b),
        },
        BinaryOp::Sub => match (left, right) {
            (Int(a), Int(b)) => int_op(op, a.checked_sub(b)),
            (l, r) => numeric_op(op, l, r, |a, b| a - b),
        },
        BinaryOp::Mul => match (left, right) {
            (Int(a), Int(b)) => int_op(op, a.checked_mul(b)),
            (l, r) => numeric_op(op, l, r, |a, b| a * b),
        },
        BinaryOp::Div => match (left, right) {
            // Int division truncates; cast an operand with double() to get
            // floating division. checked_div also covers i64::MIN / -1.
            (Int(a), Int(b)) => {
                if b == 0 {
                    Err(PiperError::DivisionByZero)
                } else {
                    int_op(op, a.checked_div(b))
                }
            }
            (l, r) => numeric_op(op, l, r, |a, b| a / b),
        },
        BinaryOp::Eq => Ok(Bool(values_equal(&left, &right))),
        BinaryOp::Ne => Ok(Bool(!values_equal(&left, &right))),
        BinaryOp::Gt | BinaryOp::Lt | BinaryOp::Ge | BinaryOp::Le => {
            let ordering = compare_values(op, &left, &right)?;
            Ok(Bool(match op {
                BinaryOp::Gt => ordering == std::cmp::Ordering::Greater,
                BinaryOp::Lt => ordering == std::cmp::Ordering::Less,
                BinaryOp::Ge => ordering != std::cmp::Ordering::Less,
                BinaryOp::Le => ordering != std::cmp::Ordering::Greater,
                _ => unreachable!(),
            }))
        }
        BinaryOp::And | BinaryOp::Or => unreachable!("logic is handled with short-circuit"),
    }
}

/// Arithmetic with Int-to-Double promotion when either side is Double.
fn numeric_op(
    op: BinaryOp,
    left: PiperValue,
    right: PiperValue,
    f: impl Fn(f64, f64) -> f64,
) -> Result<PiperValue> {
    match (&left, &right) {
        (PiperValue::Int(a), PiperValue::Double(b)) => Ok(PiperValue::Double(f(*a as f64, *b))),
        (PiperValue::Double(a), PiperValue::Int(b)) => Ok(PiperValue::Double(f(*a, *b as f64))),
        (PiperValue::Double(a), PiperValue::Double(b)) => Ok(PiperValue::Double(f(*a, *b))),
        _ => Err(PiperError::type_mismatch(
            op.symbol(),
            left.value_type(),
            right.value_type(),
        )),
    }
}

/// Equality never faults: mixed numerics compare promoted, Null equals only
/// Null, and values of unrelated types are simply unequal.
fn values_equal(left: &PiperValue, right: &PiperValue) -> bool {
    match (left, right) {
        (PiperValue::Int(a), PiperValue::Double(b)) => (*a as f64) == *b,
        (PiperValue::Double(a), PiperValue::Int(b)) => *a == (*b as f64),
        (l, r) => l == r,
    }
}

fn compare_values(
    op: BinaryOp,
    left: &PiperValue,
    right: &PiperValue,
) -> Result<std::cmp::Ordering> {
    let mismatch = || PiperError::type_mismatch(op.symbol(), left.value_type(), right.value_type());
    match (left, right) {
        (PiperValue::Int(a), PiperValue::Int(b)) => Ok(a.cmp(b)),
        (PiperValue::String(a), PiperValue::String(b)) => Ok(a.cmp(b)),
        (PiperValue::Bool(a), PiperValue::Bool(b)) => Ok(a.cmp(b)),
        (l, r) => {
            if l.value_type().is_numeric() && r.value_type().is_numeric() {
                let a = l.get_double()?;
                let b = r.get_double()?;
                a.partial_cmp(&b).ok_or_else(mismatch)
            } else {
                Err(mismatch())
            }
        }
    }
}

fn apply_unary(op: UnaryOp, value: PiperValue) -> Result<PiperValue> {
    match (op, value) {
        (UnaryOp::Neg, PiperValue::Int(v)) => v
            .checked_neg()
            .map(PiperValue::Int)
            .ok_or_else(|| PiperError::ArithmeticOverflow("-".to_string())),
        (UnaryOp::Neg, PiperValue::Double(v)) => Ok(PiperValue::Double(-v)),
        (UnaryOp::Not, PiperValue::Bool(v)) => Ok(PiperValue::Bool(!v)),
        (op, other) => Err(PiperError::invalid_operand(
            op.symbol().trim(),
            other.value_type(),
        )),
    }
}

fn apply_index(base: PiperValue, index: PiperValue) -> Result<PiperValue> {
    match (base, index) {
        (PiperValue::List(items), PiperValue::Int(i)) => {
            if i < 0 || i as usize >= items.len() {
                return Err(PiperError::IndexOutOfBounds {
                    index: i,
                    length: items.len(),
                });
            }
            Ok(items.into_iter().nth(i as usize).unwrap_or(PiperValue::Null))
        }
        // A missing map key reads as Null, matching how absent input params
        // enter a pipeline.
        (PiperValue::Map(mut map), PiperValue::String(key)) => {
            Ok(map.remove(&key).unwrap_or(PiperValue::Null))
        }
        (base, index) => Err(PiperError::type_mismatch(
            "[]",
            base.value_type(),
            index.value_type(),
        )),
    }
}
