use crate::db;
use crate::ipc::helpers::{respond, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::schedule::CollisionScope;
use rusqlite::Connection;
use serde_json::{json, Map, Value};

#[derive(Clone, Copy)]
enum SetupSection {
    Grading,
    Schedule,
    Payments,
}

const SECTIONS: [SetupSection; 3] = [
    SetupSection::Grading,
    SetupSection::Schedule,
    SetupSection::Payments,
];

impl SetupSection {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "grading" => Some(Self::Grading),
            "schedule" => Some(Self::Schedule),
            "payments" => Some(Self::Payments),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Grading => "grading",
            Self::Schedule => "schedule",
            Self::Payments => "payments",
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::Grading => "setup.grading",
            Self::Schedule => "setup.schedule",
            Self::Payments => "setup.payments",
        }
    }
}

fn default_section(section: SetupSection) -> Value {
    match section {
        SetupSection::Grading => json!({
            "periodCount": 3,
            "passingGrade": 10
        }),
        SetupSection::Schedule => json!({
            "collisionScope": "timeslot"
        }),
        SetupSection::Payments => json!({
            "dollarRate": 38.5,
            "currency": "USD"
        }),
    }
}

fn parse_i64_range(v: &Value, key: &str, min: i64, max: i64) -> Result<i64, String> {
    let n = v
        .as_i64()
        .ok_or_else(|| format!("{} must be integer", key))?;
    if !(min..=max).contains(&n) {
        return Err(format!("{} must be in {}..={}", key, min, max));
    }
    Ok(n)
}

fn parse_positive_f64(v: &Value, key: &str) -> Result<f64, String> {
    let n = v
        .as_f64()
        .ok_or_else(|| format!("{} must be a number", key))?;
    if !n.is_finite() || n <= 0.0 {
        return Err(format!("{} must be > 0", key));
    }
    Ok(n)
}

fn parse_string_max(v: &Value, key: &str, max_len: usize) -> Result<String, String> {
    let s = v.as_str().ok_or_else(|| format!("{} must be string", key))?;
    let s = s.trim();
    if s.is_empty() || s.len() > max_len {
        return Err(format!("{} length must be in 1..={}", key, max_len));
    }
    Ok(s.to_string())
}

fn merge_section_patch(
    section: SetupSection,
    current: &mut Value,
    patch: &Map<String, Value>,
) -> Result<(), String> {
    let obj = current
        .as_object_mut()
        .ok_or_else(|| "internal setup object must be a JSON object".to_string())?;
    for (k, v) in patch {
        match section {
            SetupSection::Grading => match k.as_str() {
                "periodCount" => {
                    obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 1, 6)?));
                }
                "passingGrade" => {
                    obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 1, 20)?));
                }
                _ => return Err(format!("unknown grading field: {}", k)),
            },
            SetupSection::Schedule => match k.as_str() {
                "collisionScope" => {
                    let s = parse_string_max(v, k, 16)?.to_ascii_lowercase();
                    let Some(scope) = CollisionScope::parse(&s) else {
                        return Err("collisionScope must be one of: timeslot, day".into());
                    };
                    obj.insert(k.clone(), Value::String(scope.as_str().to_string()));
                }
                _ => return Err(format!("unknown schedule field: {}", k)),
            },
            SetupSection::Payments => match k.as_str() {
                "dollarRate" => {
                    obj.insert(k.clone(), Value::from(parse_positive_f64(v, k)?));
                }
                "currency" => {
                    obj.insert(
                        k.clone(),
                        Value::String(parse_string_max(v, k, 8)?.to_ascii_uppercase()),
                    );
                }
                _ => return Err(format!("unknown payments field: {}", k)),
            },
        }
    }
    Ok(())
}

fn load_section(conn: &Connection, section: SetupSection) -> Result<Value, HandlerErr> {
    let mut current = default_section(section);
    let saved = db::settings_get_json(conn, section.key()).map_err(HandlerErr::db_query)?;
    if let Some(saved_obj) = saved.as_ref().and_then(|v| v.as_object()) {
        // Saved values went through the same validation; a bad one falls back to the default.
        let _ = merge_section_patch(section, &mut current, saved_obj);
    }
    Ok(current)
}

pub fn period_count(conn: &Connection) -> Result<i64, HandlerErr> {
    Ok(load_section(conn, SetupSection::Grading)?
        .get("periodCount")
        .and_then(|v| v.as_i64())
        .unwrap_or(3))
}

pub fn passing_grade(conn: &Connection) -> Result<f64, HandlerErr> {
    Ok(load_section(conn, SetupSection::Grading)?
        .get("passingGrade")
        .and_then(|v| v.as_f64())
        .unwrap_or(10.0))
}

pub fn collision_scope(conn: &Connection) -> Result<CollisionScope, HandlerErr> {
    Ok(load_section(conn, SetupSection::Schedule)?
        .get("collisionScope")
        .and_then(|v| v.as_str())
        .and_then(CollisionScope::parse)
        .unwrap_or_default())
}

pub struct PaymentSettings {
    pub dollar_rate: f64,
    pub currency: String,
}

pub fn payment_settings(conn: &Connection) -> Result<PaymentSettings, HandlerErr> {
    let section = load_section(conn, SetupSection::Payments)?;
    Ok(PaymentSettings {
        dollar_rate: section
            .get("dollarRate")
            .and_then(|v| v.as_f64())
            .unwrap_or(38.5),
        currency: section
            .get("currency")
            .and_then(|v| v.as_str())
            .unwrap_or("USD")
            .to_string(),
    })
}

/// Period ids run from 1 to the configured count.
pub fn validate_period(conn: &Connection, period: i64) -> Result<(), HandlerErr> {
    let count = period_count(conn)?;
    if !(1..=count).contains(&period) {
        return Err(HandlerErr::validation(format!(
            "period must be between 1 and {}",
            count
        ))
        .with_details(json!({ "period": period })));
    }
    Ok(())
}

fn setup_get(conn: &Connection) -> Result<Value, HandlerErr> {
    let mut out = Map::new();
    for section in SECTIONS {
        out.insert(section.name().to_string(), load_section(conn, section)?);
    }
    Ok(Value::Object(out))
}

fn setup_update(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let Some(section_raw) = params.get("section").and_then(|v| v.as_str()) else {
        return Err(HandlerErr::bad_params("missing section"));
    };
    let Some(section) = SetupSection::parse(section_raw) else {
        return Err(HandlerErr::bad_params("unknown section")
            .with_details(json!({ "section": section_raw })));
    };
    let Some(patch_obj) = params.get("patch").and_then(|v| v.as_object()) else {
        return Err(HandlerErr::bad_params("patch must be an object"));
    };

    let mut current = load_section(conn, section)?;
    merge_section_patch(section, &mut current, patch_obj).map_err(HandlerErr::validation)?;
    db::settings_set_json(conn, section.key(), &current)
        .map_err(|e| HandlerErr::db_update(e, "settings"))?;
    tracing::info!(section = section.name(), "settings updated");
    Ok(json!({ "section": section.name(), "value": current }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "setup.get" => Some(respond(state, req, |conn, _| setup_get(conn))),
        "setup.update" => Some(respond(state, req, setup_update)),
        _ => None,
    }
}
