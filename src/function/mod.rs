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

//! # Piper Function Module
//!
//! This module defines the calling convention shared by builtin and
//! user-defined functions, plus the typed wrapper helpers that lift plain
//! Rust closures into it.
//!
//! ## Calling Convention
//!
//! A function receives its arguments as already-evaluated values, eagerly
//! computed left to right, and returns one value or a fault. Faults raised
//! here never abort a batch; the engine converts them into a Null cell plus
//! one field error on the enclosing output field.
//!
//! Arity problems are caught at compile time through `check_arity`, so a
//! script calling `sqrt(1, 2)` fails construction rather than every row.

use std::collections::HashMap;
use std::marker::PhantomData;

use async_trait::async_trait;

use crate::errors::{PiperError, Result};
use crate::value::{PiperValue, PiperValueType};

mod builtins;
mod jsonpath;

pub(crate) use builtins::builtin_functions;

/// The contract every Piper function fulfills.
///
/// Implementations must be stateless with respect to calls; one instance is
/// shared by every row and every concurrent `process_async` call.
#[async_trait]
pub trait PiperFunction: Send + Sync {
    /// Validates an argument count at pipeline compile time. The default
    /// accepts any arity, which suits variadic functions.
    fn check_arity(&self, _count: usize) -> Result<()> {
        Ok(())
    }

    /// Applies the function to evaluated arguments.
    async fn eval(&self, args: Vec<PiperValue>) -> Result<PiperValue>;
}

/// Conversion from an argument value into a typed parameter.
///
/// The argument index only feeds the fault message.
pub trait FromPiperValue: Sized {
    fn from_piper_value(value: PiperValue, index: usize) -> Result<Self>;
}

impl FromPiperValue for PiperValue {
    fn from_piper_value(value: PiperValue, _index: usize) -> Result<Self> {
        Ok(value)
    }
}

impl FromPiperValue for i64 {
    fn from_piper_value(value: PiperValue, index: usize) -> Result<Self> {
        match value {
            PiperValue::Int(v) => Ok(v),
            other => Err(PiperError::InvalidArgumentType {
                index,
                actual: other.value_type(),
            }),
        }
    }
}

/// Doubles accept Int arguments, promoted. This is the numeric rule used by
/// the whole builtin library.
impl FromPiperValue for f64 {
    fn from_piper_value(value: PiperValue, index: usize) -> Result<Self> {
        match value {
            PiperValue::Int(v) => Ok(v as f64),
            PiperValue::Double(v) => Ok(v),
            other => Err(PiperError::InvalidArgumentType {
                index,
                actual: other.value_type(),
            }),
        }
    }
}

impl FromPiperValue for String {
    fn from_piper_value(value: PiperValue, index: usize) -> Result<Self> {
        match value {
            PiperValue::String(v) => Ok(v),
            other => Err(PiperError::InvalidArgumentType {
                index,
                actual: other.value_type(),
            }),
        }
    }
}

impl FromPiperValue for bool {
    fn from_piper_value(value: PiperValue, index: usize) -> Result<Self> {
        match value {
            PiperValue::Bool(v) => Ok(v),
            other => Err(PiperError::InvalidArgumentType {
                index,
                actual: other.value_type(),
            }),
        }
    }
}

impl FromPiperValue for Vec<PiperValue> {
    fn from_piper_value(value: PiperValue, index: usize) -> Result<Self> {
        match value {
            PiperValue::List(v) => Ok(v),
            other => Err(PiperError::InvalidArgumentType {
                index,
                actual: other.value_type(),
            }),
        }
    }
}

impl FromPiperValue for HashMap<String, PiperValue> {
    fn from_piper_value(value: PiperValue, index: usize) -> Result<Self> {
        match value {
            PiperValue::Map(v) => Ok(v),
            other => Err(PiperError::InvalidArgumentType {
                index,
                actual: other.value_type(),
            }),
        }
    }
}

/// Conversion of a return value, fallible so closures may return `Result`.
pub trait IntoPiperValue {
    fn into_piper_value(self) -> Result<PiperValue>;
}

macro_rules! infallible_return {
    ($($ty:ty),* $(,)?) => {
        $(
            impl IntoPiperValue for $ty {
                fn into_piper_value(self) -> Result<PiperValue> {
                    Ok(self.into())
                }
            }
        )*
    };
}

infallible_return!(
    PiperValue,
    bool,
    i64,
    f64,
    String,
    &str,
    Vec<PiperValue>,
    HashMap<String, PiperValue>,
);

impl<T> IntoPiperValue for Result<T>
where
    T: IntoPiperValue,
{
    fn into_piper_value(self) -> Result<PiperValue> {
        self.and_then(IntoPiperValue::into_piper_value)
    }
}

fn check_exact_arity(expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(PiperError::InvalidArgumentCount { expected, actual })
    }
}

struct UnaryFn<A, R, F> {
    f: F,
    _marker: PhantomData<fn(A) -> R>,
}

#[async_trait]
impl<A, R, F> PiperFunction for UnaryFn<A, R, F>
where
    A: FromPiperValue + Send,
    R: IntoPiperValue + Send,
    F: Fn(A) -> R + Send + Sync,
{
    fn check_arity(&self, count: usize) -> Result<()> {
        check_exact_arity(1, count)
    }

    async fn eval(&self, args: Vec<PiperValue>) -> Result<PiperValue> {
        check_exact_arity(1, args.len())?;
        let mut args = args.into_iter();
        let a = A::from_piper_value(args.next().unwrap_or(PiperValue::Null), 0)?;
        (self.f)(a).into_piper_value()
    }
}

struct BinaryFn<A, B, R, F> {
    f: F,
    _marker: PhantomData<fn(A, B) -> R>,
}

#[async_trait]
impl<A, B, R, F> PiperFunction for BinaryFn<A, B, R, F>
where
    A: FromPiperValue + Send,
    B: FromPiperValue + Send,
    R: IntoPiperValue + Send,
    F: Fn(A, B) -> R + Send + Sync,
{
    fn check_arity(&self, count: usize) -> Result<()> {
        check_exact_arity(2, count)
    }

    async fn eval(&self, args: Vec<PiperValue>) -> Result<PiperValue> {
        check_exact_arity(2, args.len())?;
        let mut args = args.into_iter();
        let a = A::from_piper_value(args.next().unwrap_or(PiperValue::Null), 0)?;
        let b = B::from_piper_value(args.next().unwrap_or(PiperValue::Null), 1)?;
        (self.f)(a, b).into_piper_value()
    }
}

struct QuaternaryFn<A, B, C, D, R, F> {
    f: F,
    _marker: PhantomData<fn(A, B, C, D) -> R>,
}

#[async_trait]
impl<A, B, C, D, R, F> PiperFunction for QuaternaryFn<A, B, C, D, R, F>
where
    A: FromPiperValue + Send,
    B: FromPiperValue + Send,
    C: FromPiperValue + Send,
    D: FromPiperValue + Send,
    R: IntoPiperValue + Send,
    F: Fn(A, B, C, D) -> R + Send + Sync,
{
    fn check_arity(&self, count: usize) -> Result<()> {
        check_exact_arity(4, count)
    }

    async fn eval(&self, args: Vec<PiperValue>) -> Result<PiperValue> {
        check_exact_arity(4, args.len())?;
        let mut args = args.into_iter();
        let a = A::from_piper_value(args.next().unwrap_or(PiperValue::Null), 0)?;
        let b = B::from_piper_value(args.next().unwrap_or(PiperValue::Null), 1)?;
        let c = C::from_piper_value(args.next().unwrap_or(PiperValue::Null), 2)?;
        let d = D::from_piper_value(args.next().unwrap_or(PiperValue::Null), 3)?;
        (self.f)(a, b, c, d).into_piper_value()
    }
}

struct VariadicFn<F> {
    f: F,
}

#[async_trait]
impl<F> PiperFunction for VariadicFn<F>
where
    F: Fn(Vec<PiperValue>) -> Result<PiperValue> + Send + Sync,
{
    async fn eval(&self, args: Vec<PiperValue>) -> Result<PiperValue> {
        (self.f)(args)
    }
}

/// Lifts a typed one-argument closure into a Piper function.
pub fn unary_fn<A, R, F>(f: F) -> impl PiperFunction
where
    A: FromPiperValue + Send,
    R: IntoPiperValue + Send,
    F: Fn(A) -> R + Send + Sync,
{
    UnaryFn {
        f,
        _marker: PhantomData,
    }
}

/// Lifts a typed two-argument closure into a Piper function.
pub fn binary_fn<A, B, R, F>(f: F) -> impl PiperFunction
where
    A: FromPiperValue + Send,
    B: FromPiperValue + Send,
    R: IntoPiperValue + Send,
    F: Fn(A, B) -> R + Send + Sync,
{
    BinaryFn {
        f,
        _marker: PhantomData,
    }
}

/// Lifts a typed four-argument closure into a Piper function.
pub fn quaternary_fn<A, B, C, D, R, F>(f: F) -> impl PiperFunction
where
    A: FromPiperValue + Send,
    B: FromPiperValue + Send,
    C: FromPiperValue + Send,
    D: FromPiperValue + Send,
    R: IntoPiperValue + Send,
    F: Fn(A, B, C, D) -> R + Send + Sync,
{
    QuaternaryFn {
        f,
        _marker: PhantomData,
    }
}

/// Lifts an untyped variadic closure into a Piper function. Used for
/// builtins like `coalesce` and handy for quick user functions.
pub fn sync_fn<F>(f: F) -> impl PiperFunction
where
    F: Fn(Vec<PiperValue>) -> Result<PiperValue> + Send + Sync,
{
    VariadicFn { f }
}

/// Builds the unified function registry: every builtin plus the caller's
/// functions. A user name colliding with a builtin (or another user name,
/// which the map input already precludes) fails construction.
pub(crate) fn build_registry(
    user_functions: HashMap<String, std::sync::Arc<dyn PiperFunction>>,
) -> Result<HashMap<String, std::sync::Arc<dyn PiperFunction>>> {
    let mut registry = builtin_functions();
    for (name, function) in user_functions {
        if registry.contains_key(&name) {
            return Err(PiperError::FunctionAlreadyDefined(name));
        }
        registry.insert(name, function);
    }
    Ok(registry)
}

pub(crate) fn invalid_argument(index: usize, actual: PiperValueType) -> PiperError {
    PiperError::InvalidArgumentType { index, actual }
}
