use crate::calc::{self, PlanEvaluation, PERIOD_WEIGHT_BUDGET};
use crate::db;
use crate::ipc::handlers::courses::find_course;
use crate::ipc::handlers::setup;
use crate::ipc::helpers::{
    get_required_date, get_required_f64, get_required_i64, get_required_str, get_required_text,
    respond, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationRow {
    pub id: String,
    pub course_id: String,
    pub title: String,
    pub weight: f64,
    pub period: i64,
    pub date: String,
    pub strategy: String,
    pub content: String,
    pub technique: String,
    pub instrument: String,
}

impl EvaluationRow {
    pub fn plan_entry(&self) -> PlanEvaluation {
        PlanEvaluation {
            id: self.id.clone(),
            title: self.title.clone(),
            period: self.period,
            weight: self.weight,
        }
    }
}

const EVALUATION_SELECT: &str = "SELECT id, course_id, title, weight, period, date, strategy, content, technique, instrument
     FROM evaluations";

fn evaluation_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<EvaluationRow> {
    Ok(EvaluationRow {
        id: r.get(0)?,
        course_id: r.get(1)?,
        title: r.get(2)?,
        weight: r.get(3)?,
        period: r.get(4)?,
        date: r.get(5)?,
        strategy: r.get(6)?,
        content: r.get(7)?,
        technique: r.get(8)?,
        instrument: r.get(9)?,
    })
}

/// The course's evaluation plan, ordered by period then entry order.
pub fn load_plan(conn: &Connection, course_id: &str) -> Result<Vec<EvaluationRow>, HandlerErr> {
    let mut stmt = conn
        .prepare(&format!(
            "{} WHERE course_id = ? ORDER BY period, sort_order",
            EVALUATION_SELECT
        ))
        .map_err(HandlerErr::db_query)?;
    stmt.query_map([course_id], evaluation_from_row)
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(HandlerErr::db_query)
}

pub fn plan_entries(rows: &[EvaluationRow]) -> Vec<PlanEvaluation> {
    rows.iter().map(EvaluationRow::plan_entry).collect()
}

fn find_evaluation(conn: &Connection, evaluation_id: &str) -> Result<EvaluationRow, HandlerErr> {
    conn.query_row(
        &format!("{} WHERE id = ?", EVALUATION_SELECT),
        [evaluation_id],
        evaluation_from_row,
    )
    .optional()
    .map_err(HandlerErr::db_query)?
    .ok_or_else(|| HandlerErr::not_found("evaluation", evaluation_id))
}

fn evaluations_list(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let course_id = get_required_str(params, "courseId")?;
    find_course(conn, &course_id)?;
    let period_filter = match params.get("period") {
        None => None,
        Some(v) if v.is_null() => None,
        Some(_) => {
            let p = get_required_i64(params, "period")?;
            setup::validate_period(conn, p)?;
            Some(p)
        }
    };

    let rows = load_plan(conn, &course_id)?;
    let plan = plan_entries(&rows);
    let periods: Vec<serde_json::Value> = (1..=setup::period_count(conn)?)
        .filter(|p| period_filter.map(|f| f == *p).unwrap_or(true))
        .map(|p| {
            let total = calc::period_weight_total(&plan, p, None);
            json!({
                "period": p,
                "weightTotal": total,
                "remaining": (PERIOD_WEIGHT_BUDGET - total).max(0.0)
            })
        })
        .collect();
    let evaluations: Vec<&EvaluationRow> = rows
        .iter()
        .filter(|e| period_filter.map(|f| f == e.period).unwrap_or(true))
        .collect();
    Ok(json!({ "evaluations": evaluations, "periods": periods }))
}

fn evaluations_create(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let course_id = get_required_str(params, "courseId")?;
    find_course(conn, &course_id)?;
    let title = get_required_text(params, "title", 1)?;
    let weight = get_required_f64(params, "weight")?;
    calc::validate_weight(weight)?;
    let period = get_required_i64(params, "period")?;
    setup::validate_period(conn, period)?;
    let date = get_required_date(params, "date")?;
    let strategy = get_required_text(params, "strategy", 1)?;
    let content = get_required_text(params, "content", 1)?;
    let technique = get_required_text(params, "technique", 1)?;
    let instrument = get_required_text(params, "instrument", 1)?;

    let plan = plan_entries(&load_plan(conn, &course_id)?);
    let weight_total = calc::check_weight_budget(&plan, period, weight)?;

    let id = Uuid::new_v4().to_string();
    let sort_order = db::next_sort_order(conn, "evaluations").map_err(HandlerErr::db_query)?;
    conn.execute(
        "INSERT INTO evaluations(id, course_id, title, weight, period, date, strategy, content, technique, instrument, sort_order)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &id,
            &course_id,
            &title,
            weight,
            period,
            &date,
            &strategy,
            &content,
            &technique,
            &instrument,
            sort_order,
        ),
    )
    .map_err(|e| HandlerErr::db_update(e, "evaluations"))?;
    tracing::info!(evaluation_id = %id, course_id = %course_id, period, weight_total, "evaluation created");
    Ok(json!({ "evaluationId": id, "weightTotal": weight_total }))
}

/// Edits keep whatever weight the user typed; the response carries the
/// resulting period total so the caller can flag an overspent plan.
fn evaluations_update(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let evaluation_id = get_required_str(params, "evaluationId")?;
    let Some(patch) = params.get("patch").filter(|v| v.is_object()) else {
        return Err(HandlerErr::bad_params("patch must be an object"));
    };
    let mut e = find_evaluation(conn, &evaluation_id)?;

    if patch.get("title").is_some() {
        e.title = get_required_text(patch, "title", 1)?;
    }
    if patch.get("weight").is_some() {
        let w = get_required_f64(patch, "weight")?;
        calc::validate_weight(w)?;
        e.weight = w;
    }
    if patch.get("period").is_some() {
        let p = get_required_i64(patch, "period")?;
        setup::validate_period(conn, p)?;
        e.period = p;
    }
    if patch.get("date").is_some() {
        e.date = get_required_date(patch, "date")?;
    }
    for (key, slot) in [
        ("strategy", &mut e.strategy),
        ("content", &mut e.content),
        ("technique", &mut e.technique),
        ("instrument", &mut e.instrument),
    ] {
        if patch.get(key).is_some() {
            *slot = get_required_text(patch, key, 1)?;
        }
    }

    conn.execute(
        "UPDATE evaluations
         SET title = ?, weight = ?, period = ?, date = ?, strategy = ?, content = ?, technique = ?, instrument = ?
         WHERE id = ?",
        (
            &e.title,
            e.weight,
            e.period,
            &e.date,
            &e.strategy,
            &e.content,
            &e.technique,
            &e.instrument,
            &evaluation_id,
        ),
    )
    .map_err(|e| HandlerErr::db_update(e, "evaluations"))?;

    let plan = plan_entries(&load_plan(conn, &e.course_id)?);
    let weight_total = calc::period_weight_total(&plan, e.period, None);
    let over_budget = weight_total > PERIOD_WEIGHT_BUDGET;
    if over_budget {
        tracing::warn!(evaluation_id = %evaluation_id, period = e.period, weight_total, "period weight over budget after edit");
    }
    Ok(json!({
        "evaluation": e,
        "weightTotal": weight_total,
        "overBudget": over_budget
    }))
}

fn evaluations_delete(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let evaluation_id = get_required_str(params, "evaluationId")?;
    find_evaluation(conn, &evaluation_id)?;

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| HandlerErr::new("db_tx_failed", e.to_string()))?;
    let grades_removed = tx
        .execute("DELETE FROM grades WHERE evaluation_id = ?", [&evaluation_id])
        .map_err(|e| HandlerErr::db_update(e, "grades"))?;
    tx.execute("DELETE FROM evaluations WHERE id = ?", [&evaluation_id])
        .map_err(|e| HandlerErr::db_update(e, "evaluations"))?;
    tx.commit()
        .map_err(|e| HandlerErr::new("db_commit_failed", e.to_string()))?;
    Ok(json!({ "ok": true, "gradesRemoved": grades_removed }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "evaluations.list" => Some(respond(state, req, evaluations_list)),
        "evaluations.create" => Some(respond(state, req, evaluations_create)),
        "evaluations.update" => Some(respond(state, req, evaluations_update)),
        "evaluations.delete" => Some(respond(state, req, evaluations_delete)),
        _ => None,
    }
}
