use crate::db;
use crate::ipc::handlers::schedule::retarget_course_cells;
use crate::ipc::helpers::{get_optional_str, get_required_str, get_required_text, respond, HandlerErr};
use crate::ipc::types::{AppState, Request};
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseRow {
    pub id: String,
    pub name: String,
    pub teacher_id: Option<String>,
    pub teacher_name: Option<String>,
}

const COURSE_SELECT: &str = "SELECT c.id, c.name, c.teacher_id, t.name
     FROM courses c
     LEFT JOIN teachers t ON t.id = c.teacher_id";

fn course_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<CourseRow> {
    Ok(CourseRow {
        id: r.get(0)?,
        name: r.get(1)?,
        teacher_id: r.get(2)?,
        teacher_name: r.get(3)?,
    })
}

pub fn list_courses(conn: &Connection) -> Result<Vec<CourseRow>, HandlerErr> {
    let mut stmt = conn
        .prepare(&format!("{} ORDER BY c.sort_order", COURSE_SELECT))
        .map_err(HandlerErr::db_query)?;
    stmt.query_map([], course_from_row)
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(HandlerErr::db_query)
}

pub fn find_course(conn: &Connection, course_id: &str) -> Result<CourseRow, HandlerErr> {
    conn.query_row(
        &format!("{} WHERE c.id = ?", COURSE_SELECT),
        [course_id],
        course_from_row,
    )
    .optional()
    .map_err(HandlerErr::db_query)?
    .ok_or_else(|| HandlerErr::not_found("course", course_id))
}

fn teacher_name(conn: &Connection, teacher_id: &str) -> Result<Option<String>, HandlerErr> {
    conn.query_row("SELECT name FROM teachers WHERE id = ?", [teacher_id], |r| {
        r.get(0)
    })
    .optional()
    .map_err(HandlerErr::db_query)
}

fn teachers_list(conn: &Connection) -> Result<serde_json::Value, HandlerErr> {
    let mut stmt = conn
        .prepare("SELECT id, name FROM teachers ORDER BY sort_order")
        .map_err(HandlerErr::db_query)?;
    let teachers: Vec<(String, String)> = stmt
        .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(HandlerErr::db_query)?;

    let courses = list_courses(conn)?;
    let rows: Vec<serde_json::Value> = teachers
        .into_iter()
        .map(|(id, name)| {
            let assigned: Vec<serde_json::Value> = courses
                .iter()
                .filter(|c| c.teacher_id.as_deref() == Some(id.as_str()))
                .map(|c| json!({ "id": c.id, "name": c.name }))
                .collect();
            json!({
                "id": id,
                "name": name,
                "assignedCourses": assigned
            })
        })
        .collect();
    Ok(json!({ "teachers": rows }))
}

fn teachers_create(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let name = get_required_text(params, "name", 2)?;
    let id = Uuid::new_v4().to_string();
    let sort_order = db::next_sort_order(conn, "teachers").map_err(HandlerErr::db_query)?;
    conn.execute(
        "INSERT INTO teachers(id, name, sort_order) VALUES(?, ?, ?)",
        (&id, &name, sort_order),
    )
    .map_err(|e| HandlerErr::db_update(e, "teachers"))?;
    tracing::info!(teacher_id = %id, "teacher created");
    Ok(json!({ "teacherId": id }))
}

/// Courses taught by the teacher become unassigned and leave the schedule.
fn teachers_delete(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let teacher_id = get_required_str(params, "teacherId")?;
    if teacher_name(conn, &teacher_id)?.is_none() {
        return Err(HandlerErr::not_found("teacher", &teacher_id));
    }
    let taught: Vec<CourseRow> = list_courses(conn)?
        .into_iter()
        .filter(|c| c.teacher_id.as_deref() == Some(teacher_id.as_str()))
        .collect();

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| HandlerErr::new("db_tx_failed", e.to_string()))?;
    tx.execute(
        "UPDATE courses SET teacher_id = NULL WHERE teacher_id = ?",
        [&teacher_id],
    )
    .map_err(|e| HandlerErr::db_update(e, "courses"))?;
    let mut cells_cleared = 0;
    for course in &taught {
        cells_cleared += retarget_course_cells(&tx, &course.id, &course.name, None)?;
    }
    tx.execute("DELETE FROM teachers WHERE id = ?", [&teacher_id])
        .map_err(|e| HandlerErr::db_update(e, "teachers"))?;
    tx.commit()
        .map_err(|e| HandlerErr::new("db_commit_failed", e.to_string()))?;
    Ok(json!({
        "ok": true,
        "coursesUnassigned": taught.len(),
        "scheduleCellsCleared": cells_cleared
    }))
}

fn courses_list(conn: &Connection) -> Result<serde_json::Value, HandlerErr> {
    Ok(json!({ "courses": list_courses(conn)? }))
}

fn optional_teacher(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<Option<String>, HandlerErr> {
    let teacher_id = get_optional_str(params, "teacherId")?;
    if let Some(t) = teacher_id.as_deref() {
        if teacher_name(conn, t)?.is_none() {
            return Err(HandlerErr::not_found("teacher", t));
        }
    }
    Ok(teacher_id)
}

fn courses_create(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let name = get_required_text(params, "name", 2)?;
    let teacher_id = optional_teacher(conn, params)?;
    let id = Uuid::new_v4().to_string();
    let sort_order = db::next_sort_order(conn, "courses").map_err(HandlerErr::db_query)?;
    conn.execute(
        "INSERT INTO courses(id, name, teacher_id, sort_order) VALUES(?, ?, ?, ?)",
        (&id, &name, &teacher_id, sort_order),
    )
    .map_err(|e| HandlerErr::db_update(e, "courses"))?;
    tracing::info!(course_id = %id, "course created");
    Ok(json!({ "courseId": id }))
}

/// Placed cells follow the course to its new teacher. A reassignment that
/// would double-book the new teacher fails with `collision` and changes
/// nothing; unassigning takes the course off the schedule.
fn courses_assign_teacher(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let course_id = get_required_str(params, "courseId")?;
    find_course(conn, &course_id)?;
    let teacher_id = optional_teacher(conn, params)?;

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| HandlerErr::new("db_tx_failed", e.to_string()))?;
    tx.execute(
        "UPDATE courses SET teacher_id = ? WHERE id = ?",
        (&teacher_id, &course_id),
    )
    .map_err(|e| HandlerErr::db_update(e, "courses"))?;
    let course = find_course(&tx, &course_id)?;
    let cells = retarget_course_cells(
        &tx,
        &course.id,
        &course.name,
        course.teacher_name.as_deref(),
    )?;
    tx.commit()
        .map_err(|e| HandlerErr::new("db_commit_failed", e.to_string()))?;
    tracing::info!(course_id = %course.id, schedule_cells = cells, "course teacher assigned");
    Ok(json!({ "course": course, "scheduleCellsUpdated": cells }))
}

/// Drops the course with its evaluation plan, grades and schedule cells.
fn courses_delete(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let course_id = get_required_str(params, "courseId")?;
    find_course(conn, &course_id)?;

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| HandlerErr::new("db_tx_failed", e.to_string()))?;
    tx.execute(
        "DELETE FROM grades WHERE evaluation_id IN (SELECT id FROM evaluations WHERE course_id = ?)",
        [&course_id],
    )
    .map_err(|e| HandlerErr::db_update(e, "grades"))?;
    let evaluations_removed = tx
        .execute("DELETE FROM evaluations WHERE course_id = ?", [&course_id])
        .map_err(|e| HandlerErr::db_update(e, "evaluations"))?;
    let cells_cleared = tx
        .execute("DELETE FROM schedule_cells WHERE course_id = ?", [&course_id])
        .map_err(|e| HandlerErr::db_update(e, "schedule_cells"))?;
    tx.execute(
        "UPDATE calendar_events SET course_id = NULL WHERE course_id = ?",
        [&course_id],
    )
    .map_err(|e| HandlerErr::db_update(e, "calendar_events"))?;
    tx.execute("DELETE FROM courses WHERE id = ?", [&course_id])
        .map_err(|e| HandlerErr::db_update(e, "courses"))?;
    tx.commit()
        .map_err(|e| HandlerErr::new("db_commit_failed", e.to_string()))?;
    tracing::info!(course_id = %course_id, evaluations_removed, cells_cleared, "course deleted");
    Ok(json!({
        "ok": true,
        "evaluationsRemoved": evaluations_removed,
        "scheduleCellsCleared": cells_cleared
    }))
}

fn parse_catalog_kind(params: &serde_json::Value) -> Result<&'static str, HandlerErr> {
    let raw = get_required_str(params, "kind")?;
    db::CATALOG_KINDS
        .iter()
        .copied()
        .find(|k| *k == raw)
        .ok_or_else(|| {
            HandlerErr::bad_params("kind must be one of: strategy, technique, instrument")
                .with_details(json!({ "kind": raw }))
        })
}

fn catalog_list(conn: &Connection) -> Result<serde_json::Value, HandlerErr> {
    let mut out: BTreeMap<&str, Vec<String>> =
        db::CATALOG_KINDS.iter().map(|k| (*k, Vec::new())).collect();
    let mut stmt = conn
        .prepare("SELECT kind, name FROM catalog_items ORDER BY kind, sort_order")
        .map_err(HandlerErr::db_query)?;
    let rows: Vec<(String, String)> = stmt
        .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(HandlerErr::db_query)?;
    for (kind, name) in rows {
        if let Some(list) = out.get_mut(kind.as_str()) {
            list.push(name);
        }
    }
    Ok(json!(out))
}

fn catalog_add(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let kind = parse_catalog_kind(params)?;
    let name = get_required_text(params, "name", 2)?;
    let sort_order: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(sort_order), -1) + 1 FROM catalog_items WHERE kind = ?",
            [kind],
            |r| r.get(0),
        )
        .map_err(HandlerErr::db_query)?;
    let inserted = conn
        .execute(
            "INSERT OR IGNORE INTO catalog_items(kind, name, sort_order) VALUES(?, ?, ?)",
            (kind, &name, sort_order),
        )
        .map_err(|e| HandlerErr::db_update(e, "catalog_items"))?;
    if inserted == 0 {
        return Err(HandlerErr::validation(format!("{} already exists", kind))
            .with_details(json!({ "kind": kind, "name": name })));
    }
    Ok(json!({ "ok": true }))
}

fn catalog_remove(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let kind = parse_catalog_kind(params)?;
    let name = get_required_str(params, "name")?;
    let removed = conn
        .execute(
            "DELETE FROM catalog_items WHERE kind = ? AND name = ?",
            (kind, &name),
        )
        .map_err(|e| HandlerErr::db_update(e, "catalog_items"))?;
    if removed == 0 {
        return Err(HandlerErr::not_found(kind, &name));
    }
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "teachers.list" => Some(respond(state, req, |conn, _| teachers_list(conn))),
        "teachers.create" => Some(respond(state, req, teachers_create)),
        "teachers.delete" => Some(respond(state, req, teachers_delete)),
        "courses.list" => Some(respond(state, req, |conn, _| courses_list(conn))),
        "courses.create" => Some(respond(state, req, courses_create)),
        "courses.assignTeacher" => Some(respond(state, req, courses_assign_teacher)),
        "courses.delete" => Some(respond(state, req, courses_delete)),
        "catalog.list" => Some(respond(state, req, |conn, _| catalog_list(conn))),
        "catalog.add" => Some(respond(state, req, catalog_add)),
        "catalog.remove" => Some(respond(state, req, catalog_remove)),
        _ => None,
    }
}
