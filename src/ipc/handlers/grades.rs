use crate::calc::{self, FinalGrade, GradeInput, PlanEvaluation};
use crate::ipc::handlers::courses::{find_course, list_courses};
use crate::ipc::handlers::evaluations::{load_plan, plan_entries};
use crate::ipc::handlers::setup;
use crate::ipc::handlers::students::{find_student, list_students};
use crate::ipc::helpers::{get_required_i64, get_required_str, respond, HandlerErr};
use crate::ipc::types::{AppState, Request};
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use std::collections::HashMap;

/// student id -> evaluation id -> grade, for one course.
pub type CourseGrades = HashMap<String, HashMap<String, f64>>;

pub fn load_course_grades(conn: &Connection, course_id: &str) -> Result<CourseGrades, HandlerErr> {
    let mut stmt = conn
        .prepare(
            "SELECT g.student_id, g.evaluation_id, g.value
             FROM grades g
             JOIN evaluations e ON e.id = g.evaluation_id
             WHERE e.course_id = ?",
        )
        .map_err(HandlerErr::db_query)?;
    let rows: Vec<(String, String, f64)> = stmt
        .query_map([course_id], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)))
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(HandlerErr::db_query)?;

    let mut out = CourseGrades::new();
    for (student_id, evaluation_id, value) in rows {
        out.entry(student_id).or_default().insert(evaluation_id, value);
    }
    Ok(out)
}

fn passing_flag(final_grade: FinalGrade, passing: f64) -> serde_json::Value {
    match final_grade.value() {
        Some(v) => json!(v >= passing),
        None => serde_json::Value::Null,
    }
}

fn grades_open(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let course_id = get_required_str(params, "courseId")?;
    let course = find_course(conn, &course_id)?;
    let period = get_required_i64(params, "period")?;
    setup::validate_period(conn, period)?;
    let passing = setup::passing_grade(conn)?;

    let plan: Vec<PlanEvaluation> = plan_entries(&load_plan(conn, &course_id)?)
        .into_iter()
        .filter(|e| e.period == period)
        .collect();
    let grades = load_course_grades(conn, &course_id)?;
    let empty = HashMap::new();

    let students: Vec<serde_json::Value> = list_students(conn)?
        .into_iter()
        .map(|s| {
            let student_grades = grades.get(&s.id).unwrap_or(&empty);
            let cells: Vec<Option<f64>> = plan
                .iter()
                .map(|e| student_grades.get(&e.id).copied())
                .collect();
            let agg = calc::period_aggregate(&plan, period, student_grades);
            json!({
                "studentId": s.id,
                "fullName": s.full_name,
                "externalId": s.external_id,
                "grades": cells,
                "final": agg.final_grade,
                "finalDisplay": agg.final_grade.display(),
                "gradedCount": agg.graded_count,
                "missingCount": agg.missing_count,
                "passing": passing_flag(agg.final_grade, passing)
            })
        })
        .collect();

    Ok(json!({
        "course": { "id": course.id, "name": course.name },
        "period": period,
        "evaluations": plan,
        "weightTotal": calc::period_weight_total(&plan, period, None),
        "passingGrade": passing,
        "students": students
    }))
}

fn grades_set(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let evaluation_id = get_required_str(params, "evaluationId")?;
    let input = calc::normalize_grade_value(params.get("value"))?;
    find_student(conn, &student_id)?;

    let evaluation: Option<(String, i64)> = conn
        .query_row(
            "SELECT course_id, period FROM evaluations WHERE id = ?",
            [&evaluation_id],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .optional()
        .map_err(HandlerErr::db_query)?;
    let Some((course_id, period)) = evaluation else {
        return Err(HandlerErr::not_found("evaluation", &evaluation_id));
    };

    let stored = match input {
        GradeInput::Set(value) => {
            conn.execute(
                "INSERT INTO grades(student_id, evaluation_id, value, updated_at)
                 VALUES(?, ?, ?, ?)
                 ON CONFLICT(student_id, evaluation_id) DO UPDATE SET
                   value = excluded.value,
                   updated_at = excluded.updated_at",
                (
                    &student_id,
                    &evaluation_id,
                    value,
                    chrono::Utc::now().to_rfc3339(),
                ),
            )
            .map_err(|e| HandlerErr::db_update(e, "grades"))?;
            Some(value)
        }
        GradeInput::Clear => {
            conn.execute(
                "DELETE FROM grades WHERE student_id = ? AND evaluation_id = ?",
                (&student_id, &evaluation_id),
            )
            .map_err(|e| HandlerErr::db_update(e, "grades"))?;
            None
        }
    };

    let plan = plan_entries(&load_plan(conn, &course_id)?);
    let grades = load_course_grades(conn, &course_id)?;
    let final_grade = grades
        .get(&student_id)
        .map(|g| calc::final_grade(&plan, period, g))
        .unwrap_or(FinalGrade::Pending);
    tracing::debug!(student_id = %student_id, evaluation_id = %evaluation_id, ?stored, "grade written");
    Ok(json!({
        "value": stored,
        "period": period,
        "final": final_grade,
        "finalDisplay": final_grade.display()
    }))
}

/// Per-course period finals for one student, plus the course average.
fn grades_student_report(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let student = find_student(conn, &student_id)?;
    let period_count = setup::period_count(conn)?;
    let passing = setup::passing_grade(conn)?;
    let empty = HashMap::new();

    let mut courses = Vec::new();
    for course in list_courses(conn)? {
        let plan = plan_entries(&load_plan(conn, &course.id)?);
        let grades = load_course_grades(conn, &course.id)?;
        let student_grades = grades.get(&student_id).unwrap_or(&empty);

        let finals: Vec<FinalGrade> = (1..=period_count)
            .map(|p| calc::final_grade(&plan, p, student_grades))
            .collect();
        let average = calc::course_average(&finals);
        let periods: Vec<serde_json::Value> = finals
            .iter()
            .enumerate()
            .map(|(i, f)| {
                json!({
                    "period": i as i64 + 1,
                    "final": f,
                    "display": f.display()
                })
            })
            .collect();
        courses.push(json!({
            "courseId": course.id,
            "courseName": course.name,
            "teacherName": course.teacher_name,
            "periods": periods,
            "average": average,
            "averageDisplay": average.display(),
            "passing": passing_flag(average, passing)
        }));
    }

    Ok(json!({
        "student": student,
        "periodCount": period_count,
        "passingGrade": passing,
        "courses": courses
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "grades.open" => Some(respond(state, req, grades_open)),
        "grades.set" => Some(respond(state, req, grades_set)),
        "grades.studentReport" => Some(respond(state, req, grades_student_report)),
        _ => None,
    }
}
