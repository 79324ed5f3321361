use crate::ipc::helpers::{respond, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::{db, sample};
use rusqlite::Connection;
use serde_json::json;

fn count(conn: &Connection, table: &str) -> Result<i64, HandlerErr> {
    conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| {
        r.get(0)
    })
    .map_err(HandlerErr::db_query)
}

fn health(conn: &Connection) -> Result<serde_json::Value, HandlerErr> {
    Ok(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "counts": {
            "students": count(conn, "students")?,
            "courses": count(conn, "courses")?,
            "evaluations": count(conn, "evaluations")?,
            "scheduleCells": count(conn, "schedule_cells")?,
            "payments": count(conn, "payments")?,
        }
    }))
}

fn session_reset(conn: &Connection) -> Result<serde_json::Value, HandlerErr> {
    db::reset_store(conn).map_err(|e| HandlerErr::new("db_update_failed", e.to_string()))?;
    tracing::info!("session store reset");
    Ok(json!({ "ok": true }))
}

fn session_seed_sample(conn: &Connection) -> Result<serde_json::Value, HandlerErr> {
    db::reset_store(conn).map_err(|e| HandlerErr::new("db_update_failed", e.to_string()))?;
    let summary = sample::seed_sample(conn)
        .map_err(|e| HandlerErr::new("db_update_failed", format!("{e:#}")))?;
    tracing::info!(?summary, "sample data loaded");
    Ok(json!(summary))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(respond(state, req, |conn, _| health(conn))),
        "session.reset" => Some(respond(state, req, |conn, _| session_reset(conn))),
        "session.seedSample" => Some(respond(state, req, |conn, _| session_seed_sample(conn))),
        _ => None,
    }
}
