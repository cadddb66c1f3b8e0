// Parsing of loosely typed request values into domain types.
//
// Bodies arrive as JSON objects whose fields may be missing, null, strings or
// numbers. Everything here records failures into `FieldErrors` so a single
// response reports every bad field.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::Value;
use std::collections::HashMap;
use std::str::FromStr;

use crate::error::{ApiError, FieldErrors};
use crate::types::InvalidChoice;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Path ids that are not integers match no row
pub fn path_id(raw: &str) -> Result<i64, ApiError> {
    raw.parse::<i64>().map_err(|_| ApiError::not_found("Not found."))
}

/// Present and not JSON null
pub fn present<'a>(body: &'a Value, field: &str) -> Option<&'a Value> {
    body.get(field).filter(|v| !v.is_null())
}

/// String field; a non-string value is recorded as an error
pub fn string(errors: &mut FieldErrors, body: &Value, field: &str) -> Option<String> {
    match present(body, field)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => {
            errors.add(field, "Not a valid string.");
            None
        }
    }
}

/// Text field checked for blank and length; `required` also rejects absence
pub fn text(errors: &mut FieldErrors, body: &Value, field: &str, max_len: usize, required: bool) -> Option<String> {
    let value = string(errors, body, field);
    if required {
        errors.text(field, value.as_deref(), max_len);
    } else {
        errors.optional_text(field, value.as_deref(), max_len);
    }
    value
}

/// Records "This field is required." for an absent value when `required`.
/// A parse error already recorded for the field takes precedence.
pub fn required<T>(errors: &mut FieldErrors, field: &str, value: Option<T>, required: bool) -> Option<T> {
    if required {
        errors.require(field, value)
    } else {
        value
    }
}

/// Take a value that validation has already required
pub fn take<T>(value: Option<T>, field: &str) -> Result<T, ApiError> {
    value.ok_or_else(|| ApiError::field(field, "This field is required."))
}

/// Primary-key reference: an integer, or a string holding one
pub fn pk(errors: &mut FieldErrors, body: &Value, field: &str) -> Option<i64> {
    let value = present(body, field)?;
    let parsed = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    if parsed.is_none() {
        errors.add(field, "Incorrect type. Expected pk value.");
    }
    parsed
}

/// Closed-set tag such as `model_type` or `category`
pub fn choice<T>(errors: &mut FieldErrors, body: &Value, field: &str) -> Option<T>
where
    T: FromStr<Err = InvalidChoice>,
{
    let raw = string(errors, body, field)?;
    match raw.parse::<T>() {
        Ok(v) => Some(v),
        Err(e) => {
            errors.add(field, e.to_string());
            None
        }
    }
}

pub fn date(errors: &mut FieldErrors, body: &Value, field: &str) -> Option<NaiveDate> {
    let raw = string(errors, body, field)?;
    match NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT) {
        Ok(d) => Some(d),
        Err(_) => {
            errors.add(
                field,
                "Date has wrong format. Use one of these formats instead: YYYY-MM-DD.",
            );
            None
        }
    }
}

/// Fixed-point value limited to `max_digits` total and `decimal_places` after the point.
/// Accepts a JSON number or a numeric string; the result is rescaled to `decimal_places`.
pub fn decimal(
    errors: &mut FieldErrors,
    body: &Value,
    field: &str,
    max_digits: u32,
    decimal_places: u32,
) -> Option<Decimal> {
    let raw = match present(body, field)? {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => {
            errors.add(field, "A valid number is required.");
            return None;
        }
    };

    let parsed = Decimal::from_str(&raw).or_else(|_| Decimal::from_scientific(&raw));
    let Ok(value) = parsed else {
        errors.add(field, "A valid number is required.");
        return None;
    };

    let value = value.normalize();
    let places = value.scale();
    let whole_digits = value.trunc().abs().to_string().trim_start_matches('0').len() as u32;

    if places + whole_digits > max_digits {
        errors.add(
            field,
            format!("Ensure that there are no more than {} digits in total.", max_digits),
        );
        return None;
    }
    if places > decimal_places {
        errors.add(
            field,
            format!("Ensure that there are no more than {} decimal places.", decimal_places),
        );
        return None;
    }
    if whole_digits > max_digits - decimal_places {
        errors.add(
            field,
            format!(
                "Ensure that there are no more than {} digits before the decimal point.",
                max_digits - decimal_places
            ),
        );
        return None;
    }

    let mut value = value;
    value.rescale(decimal_places);
    Some(value)
}

/// Optional integer filter from the query string
pub fn query_id(errors: &mut FieldErrors, query: &HashMap<String, String>, field: &str) -> Option<i64> {
    let raw = query.get(field).filter(|v| !v.is_empty())?;
    match raw.trim().parse::<i64>() {
        Ok(id) => Some(id),
        Err(_) => {
            errors.add(field, "Enter a whole number.");
            None
        }
    }
}

/// Optional closed-set filter from the query string
pub fn query_choice<T>(errors: &mut FieldErrors, query: &HashMap<String, String>, field: &str) -> Option<T>
where
    T: FromStr<Err = InvalidChoice>,
{
    let raw = query.get(field).filter(|v| !v.is_empty())?;
    match raw.parse::<T>() {
        Ok(v) => Some(v),
        Err(e) => {
            errors.add(field, format!("Select a valid choice. {}", e));
            None
        }
    }
}

pub fn query_date(errors: &mut FieldErrors, query: &HashMap<String, String>, field: &str) -> Option<NaiveDate> {
    let raw = query.get(field).filter(|v| !v.is_empty())?;
    match NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT) {
        Ok(d) => Some(d),
        Err(_) => {
            errors.add(field, "Enter a valid date.");
            None
        }
    }
}
