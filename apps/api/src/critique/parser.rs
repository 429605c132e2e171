//! Critique parser — turns sanitized model text into a [`Critique`].
//!
//! Root-level corruption is a hard failure. Field-level sloppiness is
//! tolerated where the model is known to drift:
//! - `rating` as a `"N/M"` string → `N`; unreadable strings → 0
//! - `rating` missing or null → 0
//! - `professional_suggestions` missing or null → empty list
//! - `roast_critique` missing, null or blank → [`MISSING_ROAST`]
//!
//! String values are returned exactly as the model wrote them. Anything else
//! that does not fit the shape is a schema violation.

use serde_json::{Map, Value};
use thiserror::Error;

use super::{Critique, MISSING_ROAST};

pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 10;
/// Stand-in for a rating the parser could not read.
pub const UNREADABLE_RATING: u8 = 0;

#[derive(Debug, Error)]
pub enum ParseError {
    /// Not JSON at all. Carries the text that was parsed.
    #[error("invalid JSON: {message}")]
    InvalidFormat { message: String, text: String },

    /// Valid JSON that does not fit the critique shape.
    #[error("schema violation: {message}")]
    Schema { message: String, fragment: Value },
}

impl ParseError {
    fn schema(message: impl Into<String>, fragment: &Value) -> Self {
        ParseError::Schema {
            message: message.into(),
            fragment: fragment.clone(),
        }
    }
}

pub fn parse_critique(sanitized: &str) -> Result<Critique, ParseError> {
    let root: Value = serde_json::from_str(sanitized).map_err(|e| ParseError::InvalidFormat {
        message: e.to_string(),
        text: sanitized.to_string(),
    })?;

    let object = root
        .as_object()
        .ok_or_else(|| ParseError::schema("expected a JSON object at the root", &root))?;

    Ok(Critique {
        roast_critique: roast_critique(object)?,
        professional_suggestions: professional_suggestions(object)?,
        rating: rating(object)?,
    })
}

fn roast_critique(object: &Map<String, Value>) -> Result<String, ParseError> {
    match object.get("roast_critique") {
        None | Some(Value::Null) => Ok(MISSING_ROAST.to_string()),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(MISSING_ROAST.to_string()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(ParseError::schema("roast_critique must be a string", other)),
    }
}

fn professional_suggestions(object: &Map<String, Value>) -> Result<Vec<String>, ParseError> {
    let items = match object.get("professional_suggestions") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(other) => {
            return Err(ParseError::schema(
                "professional_suggestions must be a list of strings",
                other,
            ))
        }
    };

    items
        .iter()
        .map(|item| {
            item.as_str().map(String::from).ok_or_else(|| {
                ParseError::schema("professional_suggestions entries must be strings", item)
            })
        })
        .collect()
}

fn rating(object: &Map<String, Value>) -> Result<u8, ParseError> {
    let value = match object.get("rating") {
        None | Some(Value::Null) => return Ok(UNREADABLE_RATING),
        Some(value) => value,
    };

    match value {
        Value::String(s) => Ok(rating_from_str(s)),
        Value::Number(n) => {
            let whole = n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
                .ok_or_else(|| ParseError::schema("rating must be a whole number", value))?;
            in_range(whole)
                .ok_or_else(|| ParseError::schema("rating must be between 1 and 10", value))
        }
        other => Err(ParseError::schema(
            "rating must be an integer or an \"N/10\" string",
            other,
        )),
    }
}

/// `"7/10"` → 7, `"8"` → 8; anything unreadable or out of range → 0.
fn rating_from_str(s: &str) -> u8 {
    s.split('/')
        .next()
        .and_then(|head| head.trim().parse::<i64>().ok())
        .and_then(in_range)
        .unwrap_or(UNREADABLE_RATING)
}

fn in_range(n: i64) -> Option<u8> {
    u8::try_from(n)
        .ok()
        .filter(|r| (MIN_RATING..=MAX_RATING).contains(r))
}
