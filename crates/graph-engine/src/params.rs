//! Conversion of raw user input into typed parameter values
//!
//! The target kind always comes from the block schema. Input is never
//! reinterpreted based on whether it happens to parse as a number.

use crate::error::{GraphError, Result};
use crate::types::{ParamKind, ParamValue};

/// Convert raw text to a value of the given kind
///
/// `key` is only used for error messages.
pub fn coerce_param(key: &str, kind: ParamKind, raw: &str) -> Result<ParamValue> {
    let invalid = || GraphError::InvalidParam {
        key: key.to_string(),
        raw: raw.to_string(),
        expected: kind.to_string(),
    };

    match kind {
        ParamKind::String => Ok(ParamValue::String(raw.to_string())),
        ParamKind::Int => raw
            .trim()
            .parse::<i64>()
            .map(ParamValue::Int)
            .map_err(|_| invalid()),
        ParamKind::Float => match raw.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(ParamValue::Float(v)),
            _ => Err(invalid()),
        },
        ParamKind::Bool => match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(ParamValue::Bool(true)),
            "false" | "0" | "no" | "off" => Ok(ParamValue::Bool(false)),
            _ => Err(invalid()),
        },
    }
}
