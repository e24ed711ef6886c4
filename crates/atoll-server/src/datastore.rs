//! General-purpose key/value store backing `Get`/`Set`/`SetNotify`.
//!
//! Values are arbitrary JSON. Writes go through [`DataStore::mutate`], which
//! resolves the current value (falling back to the caller's default), applies
//! the operation chain in sequence, and stores the result — one atomic
//! read-modify-write per `Set` as long as the caller serializes access, which
//! the driver does.
//!
//! Type errors in a chain abort the whole `Set` without writing; the caller
//! treats them as protocol faults.

use std::collections::HashMap;

use atoll_proto::types::{DataOperation, OperationKind};
use serde_json::{Number, Value};
use thiserror::Error;

/// Errors from applying a `Set` operation chain.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// An operation was applied to values of the wrong type.
    #[error("operation {kind} cannot be applied to {current} with operand {operand}")]
    TypeMismatch {
        /// The offending operation.
        kind: OperationKind,
        /// JSON type of the current value.
        current: &'static str,
        /// JSON type of the operand.
        operand: &'static str,
    },

    /// A float operation produced NaN or infinity, which JSON cannot carry.
    #[error("operation {kind} produced a non-finite number")]
    NonFinite {
        /// The offending operation.
        kind: OperationKind,
    },

    /// A shift operation was given an amount outside `0..64`.
    #[error("shift amount {amount} out of range for {kind}")]
    ShiftRange {
        /// The offending operation.
        kind: OperationKind,
        /// The requested shift amount.
        amount: i64,
    },
}

/// Result of one [`DataStore::mutate`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetOutcome {
    /// Value now stored under the key.
    pub value: Value,
    /// Value the chain started from (after default resolution), copied
    /// before any operation ran.
    pub original_value: Value,
}

/// The shared key/value store.
#[derive(Debug, Default)]
pub struct DataStore {
    values: HashMap<String, Value>,
}

impl DataStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value for a key, if it was ever written.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Apply an operation chain to a key and store the result.
    ///
    /// The chain starts from the stored value, or `default` when the key
    /// was never written. An empty chain writes the resolved value back
    /// unchanged — that is how clients initialize a key to its default.
    ///
    /// # Errors
    ///
    /// Returns the first operation error; the stored value is untouched in
    /// that case.
    pub fn mutate(
        &mut self,
        key: &str,
        default: Value,
        operations: &[DataOperation],
    ) -> Result<SetOutcome, StoreError> {
        let mut value = self.values.get(key).cloned().unwrap_or(default);
        let original_value = value.clone();

        for operation in operations {
            value = apply_operation(value, operation)?;
        }

        self.values.insert(key.to_owned(), value.clone());
        Ok(SetOutcome { value, original_value })
    }
}

/// A JSON number, split by representation.
#[derive(Debug, Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn as_f64(self) -> f64 {
        match self {
            Self::Int(int) => int as f64,
            Self::Float(float) => float,
        }
    }
}

fn as_num(value: &Value) -> Option<Num> {
    match value {
        Value::Number(number) => number
            .as_i64()
            .map(Num::Int)
            .or_else(|| number.as_f64().map(Num::Float)),
        _ => None,
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn mismatch(kind: OperationKind, current: &Value, operand: &Value) -> StoreError {
    StoreError::TypeMismatch { kind, current: kind_name(current), operand: kind_name(operand) }
}

fn finite(kind: OperationKind, result: f64) -> Result<Value, StoreError> {
    Number::from_f64(result)
        .map(Value::Number)
        .ok_or(StoreError::NonFinite { kind })
}

fn apply_operation(current: Value, operation: &DataOperation) -> Result<Value, StoreError> {
    let kind = operation.kind;
    let operand = &operation.value;

    match kind {
        OperationKind::Replace => Ok(operand.clone()),
        OperationKind::Default => Ok(current),

        OperationKind::Add => match (current, operand) {
            (Value::Array(mut items), Value::Array(tail)) => {
                items.extend(tail.iter().cloned());
                Ok(Value::Array(items))
            },
            (current, operand) => arithmetic(kind, &current, operand),
        },
        OperationKind::Mul | OperationKind::Pow | OperationKind::Mod => {
            arithmetic(kind, &current, operand)
        },

        OperationKind::Max | OperationKind::Min => {
            let x = as_num(&current).ok_or_else(|| mismatch(kind, &current, operand))?;
            let y = as_num(operand).ok_or_else(|| mismatch(kind, &current, operand))?;
            let keep_current = match kind {
                OperationKind::Max => x.as_f64() >= y.as_f64(),
                _ => x.as_f64() <= y.as_f64(),
            };
            Ok(if keep_current { current } else { operand.clone() })
        },

        OperationKind::Floor => round(kind, current, f64::floor),
        OperationKind::Ceil => round(kind, current, f64::ceil),

        OperationKind::And
        | OperationKind::Or
        | OperationKind::Xor
        | OperationKind::LeftShift
        | OperationKind::RightShift => bitwise(kind, &current, operand),

        OperationKind::Remove => match current {
            Value::Array(mut items) => {
                if let Some(position) = items.iter().position(|item| item == operand) {
                    items.remove(position);
                }
                Ok(Value::Array(items))
            },
            current => Err(mismatch(kind, &current, operand)),
        },

        OperationKind::Pop => pop(kind, current, operand),

        OperationKind::Update => match (current, operand) {
            (Value::Object(mut entries), Value::Object(updates)) => {
                for (key, value) in updates {
                    entries.insert(key.clone(), value.clone());
                }
                Ok(Value::Object(entries))
            },
            (current, operand) => Err(mismatch(kind, &current, operand)),
        },
    }
}

/// Numeric add/mul/pow/mod. Integer pairs stay integers; overflow and mixed
/// representations fall back to floats.
fn arithmetic(kind: OperationKind, current: &Value, operand: &Value) -> Result<Value, StoreError> {
    let x = as_num(current).ok_or_else(|| mismatch(kind, current, operand))?;
    let y = as_num(operand).ok_or_else(|| mismatch(kind, current, operand))?;

    if let (Num::Int(a), Num::Int(b)) = (x, y) {
        let int_result = match kind {
            OperationKind::Add => a.checked_add(b),
            OperationKind::Mul => a.checked_mul(b),
            OperationKind::Pow => u32::try_from(b).ok().and_then(|exp| a.checked_pow(exp)),
            _ => a.checked_rem(b),
        };
        if let Some(result) = int_result {
            return Ok(Value::from(result));
        }
    }

    let (a, b) = (x.as_f64(), y.as_f64());
    let result = match kind {
        OperationKind::Add => a + b,
        OperationKind::Mul => a * b,
        OperationKind::Pow => a.powf(b),
        _ => a % b,
    };
    finite(kind, result)
}

/// Bitwise operations require integer current value and operand.
fn bitwise(kind: OperationKind, current: &Value, operand: &Value) -> Result<Value, StoreError> {
    let (Some(a), Some(b)) = (current.as_i64(), operand.as_i64()) else {
        return Err(mismatch(kind, current, operand));
    };

    let result = match kind {
        OperationKind::And => a & b,
        OperationKind::Or => a | b,
        OperationKind::Xor => a ^ b,
        OperationKind::LeftShift | OperationKind::RightShift => {
            let amount = u32::try_from(b)
                .ok()
                .filter(|amount| *amount < 64)
                .ok_or(StoreError::ShiftRange { kind, amount: b })?;
            if kind == OperationKind::LeftShift { a << amount } else { a >> amount }
        },
        _ => return Err(mismatch(kind, current, operand)),
    };
    Ok(Value::from(result))
}

/// Floor/ceil round floats to integers and leave integers untouched.
fn round(
    kind: OperationKind,
    current: Value,
    rounder: impl Fn(f64) -> f64,
) -> Result<Value, StoreError> {
    match as_num(&current) {
        Some(Num::Int(_)) => Ok(current),
        Some(Num::Float(float)) => {
            let rounded = rounder(float);
            if (i64::MIN as f64..=i64::MAX as f64).contains(&rounded) {
                Ok(Value::from(rounded as i64))
            } else {
                finite(kind, rounded)
            }
        },
        None => Err(mismatch(kind, &current, &Value::Null)),
    }
}

/// Pop a list index (negative counts from the back) or a mapping key.
/// Missing indices and keys leave the value unchanged.
fn pop(kind: OperationKind, current: Value, operand: &Value) -> Result<Value, StoreError> {
    match (current, operand) {
        (Value::Array(mut items), operand) => {
            let Some(signed) = operand.as_i64() else {
                return Err(mismatch(kind, &Value::Array(items), operand));
            };
            let len = items.len() as i64;
            let index = if signed < 0 { signed + len } else { signed };
            if (0..len).contains(&index) {
                items.remove(index as usize);
            }
            Ok(Value::Array(items))
        },
        (Value::Object(mut entries), Value::String(key)) => {
            entries.remove(key);
            Ok(Value::Object(entries))
        },
        (current, operand) => Err(mismatch(kind, &current, operand)),
    }
}
