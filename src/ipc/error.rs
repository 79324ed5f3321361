//! Response envelopes. Every stdout line is one of these.

use serde_json::json;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

fn error_body(code: &str, message: String, details: Option<serde_json::Value>) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message,
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    error
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    json!({
        "id": id,
        "ok": false,
        "error": error_body(code, message.into(), details),
    })
}

/// Reply to a line that did not parse as a request. There is no id to echo.
pub fn bad_json(message: impl Into<String>) -> serde_json::Value {
    json!({
        "ok": false,
        "error": error_body("bad_json", message.into(), None),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn details_only_appear_when_given() {
        let plain = err("1", "not_found", "student not found", None);
        assert_eq!(plain["ok"], false);
        assert!(plain["error"].get("details").is_none());

        let detailed = err("2", "collision", "busy", Some(json!({ "day": "Lunes" })));
        assert_eq!(detailed["id"], "2");
        assert_eq!(detailed["error"]["details"]["day"], "Lunes");
    }

    #[test]
    fn bad_json_has_no_id() {
        let v = bad_json("expected value at line 1 column 1");
        assert!(v.get("id").is_none());
        assert_eq!(v["error"]["code"], "bad_json");
    }
}
