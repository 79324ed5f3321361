use crate::ipc::handlers::courses::find_course;
use crate::ipc::handlers::setup;
use crate::ipc::helpers::{get_required_str, respond, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::schedule::{Cell, Collision, Day, Schedule, ScheduledCourse, Timeslot, DAYS, TIMESLOTS};
use rusqlite::Connection;
use serde_json::json;

/// Rebuilds the weekly schedule from the stored cells. Rows whose day or
/// timeslot no longer parse are skipped.
pub fn load_schedule(conn: &Connection) -> Result<Schedule, HandlerErr> {
    let mut stmt = conn
        .prepare("SELECT day, timeslot, course_id, course_name, teacher_name FROM schedule_cells")
        .map_err(HandlerErr::db_query)?;
    let rows: Vec<(String, String, ScheduledCourse)> = stmt
        .query_map([], |r| {
            Ok((
                r.get(0)?,
                r.get(1)?,
                ScheduledCourse {
                    id: r.get(2)?,
                    name: r.get(3)?,
                    teacher_name: r.get(4)?,
                },
            ))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(HandlerErr::db_query)?;

    Ok(Schedule::from_cells(rows.into_iter().filter_map(
        |(day, slot, course)| {
            let cell = Cell::new(Day::parse(&day)?, Timeslot::parse(&slot)?);
            Some((cell, course))
        },
    )))
}

fn parse_cell(params: &serde_json::Value) -> Result<Cell, HandlerErr> {
    let day_raw = get_required_str(params, "day")?;
    let slot_raw = get_required_str(params, "timeslot")?;
    let day = Day::parse(&day_raw).ok_or_else(|| {
        HandlerErr::validation("day must be a weekday (Lunes to Viernes)")
            .with_details(json!({ "day": day_raw }))
    })?;
    let timeslot = Timeslot::parse(&slot_raw).ok_or_else(|| {
        HandlerErr::validation("unknown timeslot").with_details(json!({
            "timeslot": slot_raw,
            "timeslots": TIMESLOTS
        }))
    })?;
    Ok(Cell::new(day, timeslot))
}

/// Snapshot of a course as it will sit in the schedule. Unassigned courses
/// cannot be placed.
fn schedulable_course(conn: &Connection, course_id: &str) -> Result<ScheduledCourse, HandlerErr> {
    let course = find_course(conn, course_id)?;
    let Some(teacher_name) = course.teacher_name else {
        return Err(HandlerErr::validation("course has no assigned teacher")
            .with_details(json!({ "courseId": course.id, "courseName": course.name })));
    };
    Ok(ScheduledCourse {
        id: course.id,
        name: course.name,
        teacher_name,
    })
}

fn collision_err(collision: &Collision) -> HandlerErr {
    HandlerErr::new(
        "collision",
        format!(
            "{} already teaches {} on {} at {}",
            collision.course.teacher_name,
            collision.course.name,
            collision.existing.day.label(),
            collision.existing.timeslot.label()
        ),
    )
    .with_details(json!(collision))
}

/// Re-snapshots every cell holding the course after its teacher changed.
/// Without a teacher the course cannot stay on the schedule, so its cells
/// are cleared. Fails with `collision` when the new teacher is already busy
/// at one of the course's slots. Returns the number of cells touched.
pub fn retarget_course_cells(
    conn: &Connection,
    course_id: &str,
    course_name: &str,
    teacher_name: Option<&str>,
) -> Result<usize, HandlerErr> {
    let current = load_schedule(conn)?;
    let held: Vec<Cell> = current
        .iter()
        .filter(|(_, c)| c.id == course_id)
        .map(|(cell, _)| cell)
        .collect();
    if held.is_empty() {
        return Ok(0);
    }

    let Some(teacher_name) = teacher_name else {
        conn.execute("DELETE FROM schedule_cells WHERE course_id = ?", [course_id])
            .map_err(|e| HandlerErr::db_update(e, "schedule_cells"))?;
        return Ok(held.len());
    };

    let scope = setup::collision_scope(conn)?;
    let snapshot = ScheduledCourse {
        id: course_id.to_string(),
        name: course_name.to_string(),
        teacher_name: teacher_name.to_string(),
    };
    let mut next = held.iter().fold(current, |s, cell| s.without(*cell).0);
    for cell in &held {
        next = next
            .with_assignment(*cell, snapshot.clone(), scope)
            .map_err(|c| collision_err(&c))?
            .schedule;
    }
    conn.execute(
        "UPDATE schedule_cells SET course_name = ?, teacher_name = ? WHERE course_id = ?",
        (course_name, teacher_name, course_id),
    )
    .map_err(|e| HandlerErr::db_update(e, "schedule_cells"))?;
    Ok(held.len())
}

fn schedule_slots() -> Result<serde_json::Value, HandlerErr> {
    let days: Vec<&str> = DAYS.iter().map(|d| d.label()).collect();
    Ok(json!({ "days": days, "timeslots": TIMESLOTS }))
}

fn schedule_get(conn: &Connection) -> Result<serde_json::Value, HandlerErr> {
    let schedule = load_schedule(conn)?;
    let cells: Vec<serde_json::Value> = schedule
        .iter()
        .map(|(cell, course)| {
            json!({
                "day": cell.day,
                "timeslot": cell.timeslot,
                "course": course
            })
        })
        .collect();
    let days: Vec<&str> = DAYS.iter().map(|d| d.label()).collect();
    Ok(json!({
        "days": days,
        "cells": cells,
        "grid": schedule.grid()
    }))
}

fn schedule_check_collision(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let cell = parse_cell(params)?;
    let course_id = get_required_str(params, "courseId")?;
    let course = schedulable_course(conn, &course_id)?;
    let scope = setup::collision_scope(conn)?;
    let schedule = load_schedule(conn)?;
    let collision = schedule.check_collision(cell, &course, scope);
    Ok(json!({
        "scope": scope.as_str(),
        "collision": collision
    }))
}

fn write_cell(conn: &Connection, cell: Cell, course: &ScheduledCourse) -> Result<(), HandlerErr> {
    conn.execute(
        "INSERT INTO schedule_cells(day, timeslot, course_id, course_name, teacher_name)
         VALUES(?, ?, ?, ?, ?)
         ON CONFLICT(day, timeslot) DO UPDATE SET
           course_id = excluded.course_id,
           course_name = excluded.course_name,
           teacher_name = excluded.teacher_name",
        (
            cell.day.label(),
            cell.timeslot.label(),
            &course.id,
            &course.name,
            &course.teacher_name,
        ),
    )
    .map_err(|e| HandlerErr::db_update(e, "schedule_cells"))?;
    Ok(())
}

fn schedule_assign(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let cell = parse_cell(params)?;
    let course_id = get_required_str(params, "courseId")?;
    let course = schedulable_course(conn, &course_id)?;
    let scope = setup::collision_scope(conn)?;
    let current = load_schedule(conn)?;

    let assignment = current
        .with_assignment(cell, course.clone(), scope)
        .map_err(|c| collision_err(&c))?;
    write_cell(conn, cell, &course)?;
    tracing::info!(
        day = cell.day.label(),
        timeslot = cell.timeslot.label(),
        course_id = %course.id,
        "schedule cell assigned"
    );
    Ok(json!({
        "cell": cell,
        "course": course,
        "replaced": assignment.replaced,
        "grid": assignment.schedule.grid()
    }))
}

fn schedule_clear_cell(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let cell = parse_cell(params)?;
    let (next, removed) = load_schedule(conn)?.without(cell);
    if removed.is_some() {
        conn.execute(
            "DELETE FROM schedule_cells WHERE day = ? AND timeslot = ?",
            (cell.day.label(), cell.timeslot.label()),
        )
        .map_err(|e| HandlerErr::db_update(e, "schedule_cells"))?;
    }
    Ok(json!({
        "cleared": removed,
        "grid": next.grid()
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "schedule.slots" => Some(respond(state, req, |_, _| schedule_slots())),
        "schedule.get" => Some(respond(state, req, |conn, _| schedule_get(conn))),
        "schedule.checkCollision" => Some(respond(state, req, schedule_check_collision)),
        "schedule.assign" => Some(respond(state, req, schedule_assign)),
        "schedule.clearCell" => Some(respond(state, req, schedule_clear_cell)),
        _ => None,
    }
}
