use crate::db;
use crate::ipc::handlers::courses::find_course;
use crate::ipc::helpers::{
    get_optional_str, get_required_date, get_required_str, get_required_text, respond, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRow {
    pub id: String,
    pub title: String,
    pub date: String,
    pub course_id: Option<String>,
    pub course_name: Option<String>,
    pub editable: bool,
}

const EVENT_SELECT: &str = "SELECT e.id, e.title, e.date, e.course_id, c.name, e.editable
     FROM calendar_events e
     LEFT JOIN courses c ON c.id = e.course_id";

fn event_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<EventRow> {
    Ok(EventRow {
        id: r.get(0)?,
        title: r.get(1)?,
        date: r.get(2)?,
        course_id: r.get(3)?,
        course_name: r.get(4)?,
        editable: r.get::<_, i64>(5)? != 0,
    })
}

fn find_event(conn: &Connection, event_id: &str) -> Result<EventRow, HandlerErr> {
    conn.query_row(
        &format!("{} WHERE e.id = ?", EVENT_SELECT),
        [event_id],
        event_from_row,
    )
    .optional()
    .map_err(HandlerErr::db_query)?
    .ok_or_else(|| HandlerErr::not_found("calendar event", event_id))
}

/// Looks the event up and refuses system events.
fn find_editable_event(conn: &Connection, event_id: &str) -> Result<EventRow, HandlerErr> {
    let event = find_event(conn, event_id)?;
    if !event.editable {
        return Err(HandlerErr::new("not_editable", "calendar event is not editable")
            .with_details(json!({ "eventId": event.id, "title": event.title })));
    }
    Ok(event)
}

fn optional_course(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<Option<String>, HandlerErr> {
    let course_id = get_optional_str(params, "courseId")?;
    if let Some(id) = course_id.as_deref() {
        find_course(conn, id)?;
    }
    Ok(course_id)
}

fn calendar_list(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let course_filter = get_optional_str(params, "courseId")?;
    let mut stmt = conn
        .prepare(&format!(
            "{} WHERE (?1 IS NULL OR e.course_id = ?1) ORDER BY e.date, e.sort_order",
            EVENT_SELECT
        ))
        .map_err(HandlerErr::db_query)?;
    let events: Vec<EventRow> = stmt
        .query_map([&course_filter], event_from_row)
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(HandlerErr::db_query)?;
    Ok(json!({ "events": events }))
}

fn calendar_create(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let title = get_required_text(params, "title", 1)?;
    let date = get_required_date(params, "date")?;
    let course_id = optional_course(conn, params)?;

    let id = Uuid::new_v4().to_string();
    let sort_order = db::next_sort_order(conn, "calendar_events").map_err(HandlerErr::db_query)?;
    conn.execute(
        "INSERT INTO calendar_events(id, title, date, course_id, editable, sort_order)
         VALUES(?, ?, ?, ?, 1, ?)",
        (&id, &title, &date, &course_id, sort_order),
    )
    .map_err(|e| HandlerErr::db_update(e, "calendar_events"))?;
    Ok(json!({ "event": find_event(conn, &id)? }))
}

fn calendar_update(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let event_id = get_required_str(params, "eventId")?;
    let Some(patch) = params.get("patch").filter(|v| v.is_object()) else {
        return Err(HandlerErr::bad_params("patch must be an object"));
    };
    let current = find_editable_event(conn, &event_id)?;

    let title = if patch.get("title").is_some() {
        get_required_text(patch, "title", 1)?
    } else {
        current.title
    };
    let date = if patch.get("date").is_some() {
        get_required_date(patch, "date")?
    } else {
        current.date
    };
    let course_id = if patch.get("courseId").is_some() {
        optional_course(conn, patch)?
    } else {
        current.course_id
    };

    conn.execute(
        "UPDATE calendar_events SET title = ?, date = ?, course_id = ? WHERE id = ?",
        (&title, &date, &course_id, &event_id),
    )
    .map_err(|e| HandlerErr::db_update(e, "calendar_events"))?;
    Ok(json!({ "event": find_event(conn, &event_id)? }))
}

/// Drag-and-drop on the calendar: only the date changes.
fn calendar_move(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let event_id = get_required_str(params, "eventId")?;
    let date = get_required_date(params, "date")?;
    find_editable_event(conn, &event_id)?;
    conn.execute(
        "UPDATE calendar_events SET date = ? WHERE id = ?",
        (&date, &event_id),
    )
    .map_err(|e| HandlerErr::db_update(e, "calendar_events"))?;
    Ok(json!({ "event": find_event(conn, &event_id)? }))
}

fn calendar_delete(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let event_id = get_required_str(params, "eventId")?;
    find_editable_event(conn, &event_id)?;
    conn.execute("DELETE FROM calendar_events WHERE id = ?", [&event_id])
        .map_err(|e| HandlerErr::db_update(e, "calendar_events"))?;
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "calendar.list" => Some(respond(state, req, calendar_list)),
        "calendar.create" => Some(respond(state, req, calendar_create)),
        "calendar.update" => Some(respond(state, req, calendar_update)),
        "calendar.move" => Some(respond(state, req, calendar_move)),
        "calendar.delete" => Some(respond(state, req, calendar_delete)),
        _ => None,
    }
}
