use crate::calc::{self, PlanEvaluation};
use crate::export::{self, BundleEntry, ReportTable};
use crate::ipc::handlers::courses::{find_course, list_courses};
use crate::ipc::handlers::evaluations::{load_plan, EvaluationRow};
use crate::ipc::handlers::grades::load_course_grades;
use crate::ipc::handlers::payments::list_payments;
use crate::ipc::handlers::schedule::load_schedule;
use crate::ipc::handlers::setup;
use crate::ipc::handlers::students::list_students;
use crate::ipc::helpers::{get_required_i64, get_required_str, respond, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::schedule::DAYS;
use rusqlite::Connection;
use serde_json::json;
use std::collections::HashMap;
use std::path::PathBuf;

fn headers(labels: &[&str]) -> Vec<String> {
    labels.iter().map(|s| s.to_string()).collect()
}

/// Grades and weights print without a trailing ".0".
fn fmt_number(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{}", v as i64)
    } else {
        format!("{}", calc::round_off_2_decimals(v))
    }
}

fn student_list_table(conn: &Connection) -> Result<ReportTable, HandlerErr> {
    let mut table = ReportTable::new("Listado de Estudiantes", headers(&["Cédula", "Nombre Completo"]));
    for s in list_students(conn)? {
        table.push_row(vec![s.external_id, s.full_name]);
    }
    Ok(table)
}

fn evaluation_plan_table(course_name: &str, period: i64, rows: &[EvaluationRow]) -> ReportTable {
    let mut table = ReportTable::new(
        format!("Plan de Evaluación - {} - Lapso {}", course_name, period),
        headers(&[
            "Fecha",
            "Título",
            "Estrategia",
            "Contenido",
            "Técnica",
            "Instrumento",
            "Ponderación (%)",
        ]),
    );
    for e in rows.iter().filter(|e| e.period == period) {
        table.push_row(vec![
            e.date.clone(),
            e.title.clone(),
            e.strategy.clone(),
            e.content.clone(),
            e.technique.clone(),
            e.instrument.clone(),
            format!("{}%", fmt_number(e.weight)),
        ]);
    }
    table
}

fn period_grades_table(
    conn: &Connection,
    course_id: &str,
    course_name: &str,
    period: i64,
    rows: &[EvaluationRow],
) -> Result<ReportTable, HandlerErr> {
    let plan: Vec<PlanEvaluation> = rows
        .iter()
        .filter(|e| e.period == period)
        .map(EvaluationRow::plan_entry)
        .collect();
    let mut cols = vec!["Estudiante".to_string()];
    cols.extend(
        plan.iter()
            .map(|e| format!("{} ({}%)", e.title, fmt_number(e.weight))),
    );
    cols.push("Nota Final".to_string());
    let mut table = ReportTable::new(
        format!("Notas del Lapso {} - {}", period, course_name),
        cols,
    );

    let grades = load_course_grades(conn, course_id)?;
    let empty = HashMap::new();
    for s in list_students(conn)? {
        let student_grades = grades.get(&s.id).unwrap_or(&empty);
        let mut row = vec![s.full_name];
        row.extend(plan.iter().map(|e| {
            student_grades
                .get(&e.id)
                .map(|g| fmt_number(*g))
                .unwrap_or_else(|| "-".to_string())
        }));
        row.push(calc::final_grade(&plan, period, student_grades).display());
        table.push_row(row);
    }
    Ok(table)
}

fn payments_table(conn: &Connection) -> Result<ReportTable, HandlerErr> {
    let settings = setup::payment_settings(conn)?;
    let mut table = ReportTable::new(
        format!(
            "Reporte de Pagos (Tasa del Dólar: {} {})",
            settings.dollar_rate, settings.currency
        ),
        headers(&["Estudiante", "Plan", "Monto ($)", "Monto (Bs)", "Método", "Fecha", "Hora"]),
    );
    for p in list_payments(conn)? {
        table.push_row(vec![
            p.student_name,
            p.plan_name,
            format!("${}", fmt_number(p.amount)),
            format!("{:.2}", p.amount * settings.dollar_rate),
            p.method,
            p.date,
            p.time,
        ]);
    }
    Ok(table)
}

fn schedule_table(conn: &Connection) -> Result<ReportTable, HandlerErr> {
    let mut cols = vec!["Hora".to_string()];
    cols.extend(DAYS.iter().map(|d| d.label().to_string()));
    let mut table = ReportTable::new("Horario Semanal", cols);
    for row in load_schedule(conn)?.grid() {
        let mut out = vec![row.timeslot.label().to_string()];
        out.extend(row.cells.into_iter().map(|c| {
            c.map(|course| format!("{} ({})", course.name, course.teacher_name))
                .unwrap_or_default()
        }));
        table.push_row(out);
    }
    Ok(table)
}

fn course_period_params(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<(String, String, i64), HandlerErr> {
    let course_id = get_required_str(params, "courseId")?;
    let course = find_course(conn, &course_id)?;
    let period = get_required_i64(params, "period")?;
    setup::validate_period(conn, period)?;
    Ok((course.id, course.name, period))
}

fn table_result(table: ReportTable) -> Result<serde_json::Value, HandlerErr> {
    Ok(json!(table))
}

fn reports_evaluation_plan(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let (course_id, course_name, period) = course_period_params(conn, params)?;
    let rows = load_plan(conn, &course_id)?;
    table_result(evaluation_plan_table(&course_name, period, &rows))
}

fn reports_period_grades(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let (course_id, course_name, period) = course_period_params(conn, params)?;
    let rows = load_plan(conn, &course_id)?;
    table_result(period_grades_table(conn, &course_id, &course_name, period, &rows)?)
}

/// Every report in one zip: the global tables plus plan and grades for each
/// course period that has evaluations.
fn reports_export_bundle(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let out_path = PathBuf::from(get_required_str(params, "outPath")?);

    let mut entries = vec![
        BundleEntry {
            name: "estudiantes.csv".to_string(),
            table: student_list_table(conn)?,
        },
        BundleEntry {
            name: "pagos.csv".to_string(),
            table: payments_table(conn)?,
        },
        BundleEntry {
            name: "horario.csv".to_string(),
            table: schedule_table(conn)?,
        },
    ];
    let period_count = setup::period_count(conn)?;
    for course in list_courses(conn)? {
        let rows = load_plan(conn, &course.id)?;
        let slug = export::slug(&course.name);
        for period in 1..=period_count {
            if !rows.iter().any(|e| e.period == period) {
                continue;
            }
            entries.push(BundleEntry {
                name: format!("{}/plan_lapso_{}.csv", slug, period),
                table: evaluation_plan_table(&course.name, period, &rows),
            });
            entries.push(BundleEntry {
                name: format!("{}/notas_lapso_{}.csv", slug, period),
                table: period_grades_table(conn, &course.id, &course.name, period, &rows)?,
            });
        }
    }

    let summary = export::write_report_bundle(&entries, &out_path).map_err(|e| {
        HandlerErr::new("io_failed", format!("{e:#}"))
            .with_details(json!({ "outPath": out_path.to_string_lossy() }))
    })?;
    tracing::info!(
        out_path = %out_path.display(),
        entries = summary.entry_count,
        "report bundle exported"
    );
    Ok(json!({
        "outPath": out_path.to_string_lossy(),
        "summary": summary
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "reports.studentList" => Some(respond(state, req, |conn, _| {
            table_result(student_list_table(conn)?)
        })),
        "reports.evaluationPlan" => Some(respond(state, req, reports_evaluation_plan)),
        "reports.periodGrades" => Some(respond(state, req, reports_period_grades)),
        "reports.payments" => Some(respond(state, req, |conn, _| {
            table_result(payments_table(conn)?)
        })),
        "reports.schedule" => Some(respond(state, req, |conn, _| {
            table_result(schedule_table(conn)?)
        })),
        "reports.exportBundle" => Some(respond(state, req, reports_export_bundle)),
        _ => None,
    }
}
