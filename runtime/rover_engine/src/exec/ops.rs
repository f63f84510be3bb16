//! Binary and unary operator evaluation.
//!
//! Direct enum dispatch over operator kinds. Logical and/or are handled
//! by the engine itself (they short-circuit, so their right operand must
//! not be evaluated here).

use rover_ir::{BinaryOp, UnaryOp};
use rover_value::{errors, RuntimeError, RuntimeValue};

/// Evaluate a non-short-circuit binary operation.
pub(crate) fn evaluate_binary(
    op: BinaryOp,
    left: &RuntimeValue,
    right: &RuntimeValue,
) -> Result<RuntimeValue, RuntimeError> {
    match op {
        BinaryOp::Add => arithmetic(left, right, |a, b| a + b),
        BinaryOp::Sub => arithmetic(left, right, |a, b| a - b),
        BinaryOp::Mul => arithmetic(left, right, |a, b| a * b),
        BinaryOp::Div => {
            let b = right.as_number()?;
            if b == 0.0 {
                return Err(errors::division_by_zero());
            }
            Ok(RuntimeValue::number(left.as_number()? / b))
        }
        BinaryOp::Mod => {
            let b = right.as_number()?;
            if b == 0.0 {
                return Err(errors::division_by_zero());
            }
            Ok(RuntimeValue::number(left.as_number()? % b))
        }
        BinaryOp::Concat => {
            let mut text = left.string_value()?;
            text.push_str(&right.string_value()?);
            Ok(RuntimeValue::text(text))
        }
        BinaryOp::Eq => Ok(RuntimeValue::boolean(left.value_equals(right)?)),
        BinaryOp::NotEq => Ok(RuntimeValue::boolean(!left.value_equals(right)?)),
        BinaryOp::Lt => compare(left, right, |o| o == std::cmp::Ordering::Less),
        BinaryOp::LtEq => compare(left, right, |o| o != std::cmp::Ordering::Greater),
        BinaryOp::Gt => compare(left, right, |o| o == std::cmp::Ordering::Greater),
        BinaryOp::GtEq => compare(left, right, |o| o != std::cmp::Ordering::Less),
        BinaryOp::And | BinaryOp::Or => Err(errors::runtime_error(
            "short-circuit operator reached operator evaluation",
        )),
    }
}

fn arithmetic(
    left: &RuntimeValue,
    right: &RuntimeValue,
    f: impl FnOnce(f64, f64) -> f64,
) -> Result<RuntimeValue, RuntimeError> {
    Ok(RuntimeValue::number(f(left.as_number()?, right.as_number()?)))
}

/// Order two values: numerically when both sides have a well-formed
/// numeric value, by string representation otherwise.
fn compare(
    left: &RuntimeValue,
    right: &RuntimeValue,
    f: impl FnOnce(std::cmp::Ordering) -> bool,
) -> Result<RuntimeValue, RuntimeError> {
    let ordering = match (left.numeric()?, right.numeric()?) {
        (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(std::cmp::Ordering::Equal),
        _ => left.string_value()?.cmp(&right.string_value()?),
    };
    Ok(RuntimeValue::boolean(f(ordering)))
}

/// Evaluate a unary prefix operation.
///
/// Increment/decrement are lowered by the builder into variable rebinds
/// and never reach this function.
pub(crate) fn evaluate_unary(
    op: UnaryOp,
    operand: &RuntimeValue,
) -> Result<RuntimeValue, RuntimeError> {
    match op {
        UnaryOp::Neg => Ok(RuntimeValue::number(-operand.as_number()?)),
        UnaryOp::Not => Ok(RuntimeValue::boolean(!operand.as_boolean()?)),
        UnaryOp::StringCast => Ok(RuntimeValue::text(operand.string_value()?)),
        UnaryOp::Increment | UnaryOp::Decrement => Err(errors::runtime_error(
            "increment/decrement reached operator evaluation",
        )),
    }
}
