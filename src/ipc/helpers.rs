use crate::calc::CalcError;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use chrono::NaiveDate;
use rusqlite::Connection;
use serde_json::json;

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn bad_params(message: impl Into<String>) -> Self {
        Self::new("bad_params", message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new("validation_failed", message)
    }

    pub fn not_found(what: &str, id: &str) -> Self {
        Self::new("not_found", format!("{} not found", what)).with_details(json!({ "id": id }))
    }

    pub fn db_query(e: impl ToString) -> Self {
        Self::new("db_query_failed", e.to_string())
    }

    pub fn db_update(e: impl ToString, table: &str) -> Self {
        Self::new("db_update_failed", e.to_string()).with_details(json!({ "table": table }))
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

impl From<CalcError> for HandlerErr {
    fn from(e: CalcError) -> Self {
        let code = match e.code.as_str() {
            "bad_params" => "bad_params",
            _ => "validation_failed",
        };
        HandlerErr {
            code,
            message: e.message,
            details: e.details,
        }
    }
}

/// Runs one handler body against the store and wraps the outcome in the
/// response envelope.
pub fn respond<F>(state: &mut AppState, req: &Request, f: F) -> serde_json::Value
where
    F: FnOnce(&Connection, &serde_json::Value) -> Result<serde_json::Value, HandlerErr>,
{
    match f(&state.db, &req.params) {
        Ok(result) => {
            tracing::debug!(method = %req.method, id = %req.id, "request handled");
            ok(&req.id, result)
        }
        Err(error) => {
            tracing::warn!(
                method = %req.method,
                id = %req.id,
                code = error.code,
                "request rejected: {}",
                error.message
            );
            error.response(&req.id)
        }
    }
}

pub fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn get_optional_str(
    params: &serde_json::Value,
    key: &str,
) -> Result<Option<String>, HandlerErr> {
    match params.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => v
            .as_str()
            .map(|s| Some(s.trim().to_string()).filter(|t| !t.is_empty()))
            .ok_or_else(|| HandlerErr::bad_params(format!("{} must be string or null", key))),
    }
}

/// Required free-text field: trimmed, at least `min_chars` characters.
pub fn get_required_text(
    params: &serde_json::Value,
    key: &str,
    min_chars: usize,
) -> Result<String, HandlerErr> {
    let raw = params.get(key).and_then(|v| v.as_str()).unwrap_or("");
    let t = raw.trim();
    if t.chars().count() < min_chars {
        return Err(HandlerErr::validation(if min_chars <= 1 {
            format!("{} is required", key)
        } else {
            format!("{} must have at least {} characters", key, min_chars)
        })
        .with_details(json!({ "field": key })));
    }
    Ok(t.to_string())
}

pub fn get_required_f64(params: &serde_json::Value, key: &str) -> Result<f64, HandlerErr> {
    let Some(v) = params.get(key) else {
        return Err(HandlerErr::bad_params(format!("missing {}", key)));
    };
    if let Some(n) = v.as_f64() {
        return Ok(n);
    }
    v.as_str()
        .and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|n| n.is_finite())
        .ok_or_else(|| HandlerErr::validation(format!("{} must be a number", key)))
}

pub fn get_required_i64(params: &serde_json::Value, key: &str) -> Result<i64, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing integer {}", key)))
}

/// `YYYY-MM-DD`, normalised.
pub fn get_required_date(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    let raw = get_required_text(params, key, 1)?;
    parse_date(&raw).map_err(|_| {
        HandlerErr::validation(format!("{} must be a date (YYYY-MM-DD)", key))
            .with_details(json!({ "field": key, "value": raw }))
    })
}

pub fn parse_date(raw: &str) -> Result<String, chrono::ParseError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map(|d| d.format("%Y-%m-%d").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_text_trims_and_checks_length() {
        let p = json!({ "name": "  Ana  ", "short": "x" });
        assert_eq!(get_required_text(&p, "name", 2).ok(), Some("Ana".to_string()));
        let e = get_required_text(&p, "short", 2).err().expect("too short");
        assert_eq!(e.code, "validation_failed");
        assert_eq!(get_required_text(&p, "missing", 1).err().map(|e| e.code), Some("validation_failed"));
    }

    #[test]
    fn numbers_accept_numeric_strings() {
        let p = json!({ "a": 40, "b": "60", "c": "x" });
        assert_eq!(get_required_f64(&p, "a").ok(), Some(40.0));
        assert_eq!(get_required_f64(&p, "b").ok(), Some(60.0));
        assert_eq!(get_required_f64(&p, "c").err().map(|e| e.code), Some("validation_failed"));
        assert_eq!(get_required_f64(&p, "d").err().map(|e| e.code), Some("bad_params"));
    }

    #[test]
    fn dates_are_validated() {
        assert_eq!(parse_date("2025-10-20").ok(), Some("2025-10-20".to_string()));
        assert!(parse_date("2025-13-01").is_err());
        assert!(parse_date("20/10/2025").is_err());
    }
}
