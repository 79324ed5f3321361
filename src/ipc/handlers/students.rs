use crate::db;
use crate::ipc::helpers::{get_required_str, get_required_text, respond, HandlerErr};
use crate::ipc::types::{AppState, Request};
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRow {
    pub id: String,
    pub full_name: String,
    pub external_id: String,
    pub sort_order: i64,
}

pub fn list_students(conn: &Connection) -> Result<Vec<StudentRow>, HandlerErr> {
    let mut stmt = conn
        .prepare(
            "SELECT id, full_name, external_id, sort_order
             FROM students
             ORDER BY sort_order",
        )
        .map_err(HandlerErr::db_query)?;
    stmt.query_map([], |r| {
        Ok(StudentRow {
            id: r.get(0)?,
            full_name: r.get(1)?,
            external_id: r.get(2)?,
            sort_order: r.get(3)?,
        })
    })
    .and_then(|it| it.collect::<Result<Vec<_>, _>>())
    .map_err(HandlerErr::db_query)
}

pub fn find_student(conn: &Connection, student_id: &str) -> Result<StudentRow, HandlerErr> {
    conn.query_row(
        "SELECT id, full_name, external_id, sort_order FROM students WHERE id = ?",
        [student_id],
        |r| {
            Ok(StudentRow {
                id: r.get(0)?,
                full_name: r.get(1)?,
                external_id: r.get(2)?,
                sort_order: r.get(3)?,
            })
        },
    )
    .optional()
    .map_err(HandlerErr::db_query)?
    .ok_or_else(|| HandlerErr::not_found("student", student_id))
}

fn ensure_external_id_free(
    conn: &Connection,
    external_id: &str,
    except_student: Option<&str>,
) -> Result<(), HandlerErr> {
    let holder: Option<String> = conn
        .query_row(
            "SELECT id FROM students WHERE external_id = ?",
            [external_id],
            |r| r.get(0),
        )
        .optional()
        .map_err(HandlerErr::db_query)?;
    match holder {
        Some(id) if Some(id.as_str()) != except_student => Err(HandlerErr::validation(
            "externalId already belongs to another student",
        )
        .with_details(json!({ "externalId": external_id, "studentId": id }))),
        _ => Ok(()),
    }
}

fn students_list(conn: &Connection) -> Result<serde_json::Value, HandlerErr> {
    Ok(json!({ "students": list_students(conn)? }))
}

fn students_create(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let full_name = get_required_text(params, "fullName", 2)?;
    let external_id = get_required_text(params, "externalId", 1)?;
    ensure_external_id_free(conn, &external_id, None)?;

    let id = Uuid::new_v4().to_string();
    let sort_order = db::next_sort_order(conn, "students").map_err(HandlerErr::db_query)?;
    conn.execute(
        "INSERT INTO students(id, full_name, external_id, sort_order) VALUES(?, ?, ?, ?)",
        (&id, &full_name, &external_id, sort_order),
    )
    .map_err(|e| HandlerErr::db_update(e, "students"))?;
    tracing::info!(student_id = %id, "student created");
    Ok(json!({ "studentId": id }))
}

fn students_update(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let Some(patch) = params.get("patch").filter(|v| v.is_object()) else {
        return Err(HandlerErr::bad_params("patch must be an object"));
    };
    let current = find_student(conn, &student_id)?;

    let full_name = if patch.get("fullName").is_some() {
        get_required_text(patch, "fullName", 2)?
    } else {
        current.full_name
    };
    let external_id = if patch.get("externalId").is_some() {
        let v = get_required_text(patch, "externalId", 1)?;
        ensure_external_id_free(conn, &v, Some(&student_id))?;
        v
    } else {
        current.external_id
    };

    conn.execute(
        "UPDATE students SET full_name = ?, external_id = ? WHERE id = ?",
        (&full_name, &external_id, &student_id),
    )
    .map_err(|e| HandlerErr::db_update(e, "students"))?;
    Ok(json!({ "ok": true }))
}

/// Removes the student and their grades. Payment history keeps the name
/// snapshot taken at registration.
fn students_delete(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    find_student(conn, &student_id)?;

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| HandlerErr::new("db_tx_failed", e.to_string()))?;
    let grades_removed = tx
        .execute("DELETE FROM grades WHERE student_id = ?", [&student_id])
        .map_err(|e| HandlerErr::db_update(e, "grades"))?;
    tx.execute("DELETE FROM students WHERE id = ?", [&student_id])
        .map_err(|e| HandlerErr::db_update(e, "students"))?;
    tx.commit()
        .map_err(|e| HandlerErr::new("db_commit_failed", e.to_string()))?;
    tracing::info!(student_id = %student_id, grades_removed, "student deleted");
    Ok(json!({ "ok": true, "gradesRemoved": grades_removed }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(respond(state, req, |conn, _| students_list(conn))),
        "students.create" => Some(respond(state, req, students_create)),
        "students.update" => Some(respond(state, req, students_update)),
        "students.delete" => Some(respond(state, req, students_delete)),
        _ => None,
    }
}
