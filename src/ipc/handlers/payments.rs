use crate::db;
use crate::ipc::handlers::setup;
use crate::ipc::handlers::students::find_student;
use crate::ipc::helpers::{
    get_optional_str, get_required_date, get_required_f64, get_required_str, get_required_text,
    respond, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanRow {
    pub id: String,
    pub name: String,
    pub price: f64,
    pub description: Option<String>,
    pub active: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRow {
    pub id: String,
    pub student_id: String,
    pub student_name: String,
    pub plan_id: String,
    pub plan_name: String,
    pub amount: f64,
    pub method: String,
    pub date: String,
    pub time: String,
}

fn plan_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<PlanRow> {
    Ok(PlanRow {
        id: r.get(0)?,
        name: r.get(1)?,
        price: r.get(2)?,
        description: r.get(3)?,
        active: r.get::<_, i64>(4)? != 0,
        created_at: r.get(5)?,
    })
}

pub fn list_plans(conn: &Connection) -> Result<Vec<PlanRow>, HandlerErr> {
    let mut stmt = conn
        .prepare(
            "SELECT id, name, price, description, active, created_at
             FROM payment_plans
             ORDER BY sort_order",
        )
        .map_err(HandlerErr::db_query)?;
    stmt.query_map([], plan_from_row)
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(HandlerErr::db_query)
}

fn find_plan(conn: &Connection, plan_id: &str) -> Result<PlanRow, HandlerErr> {
    conn.query_row(
        "SELECT id, name, price, description, active, created_at FROM payment_plans WHERE id = ?",
        [plan_id],
        plan_from_row,
    )
    .optional()
    .map_err(HandlerErr::db_query)?
    .ok_or_else(|| HandlerErr::not_found("payment plan", plan_id))
}

/// Payment history, newest first.
pub fn list_payments(conn: &Connection) -> Result<Vec<PaymentRow>, HandlerErr> {
    let mut stmt = conn
        .prepare(
            "SELECT id, student_id, student_name, plan_id, plan_name, amount, method, date, time
             FROM payments
             ORDER BY date DESC, time DESC, sort_order DESC",
        )
        .map_err(HandlerErr::db_query)?;
    stmt.query_map([], |r| {
        Ok(PaymentRow {
            id: r.get(0)?,
            student_id: r.get(1)?,
            student_name: r.get(2)?,
            plan_id: r.get(3)?,
            plan_name: r.get(4)?,
            amount: r.get(5)?,
            method: r.get(6)?,
            date: r.get(7)?,
            time: r.get(8)?,
        })
    })
    .and_then(|it| it.collect::<Result<Vec<_>, _>>())
    .map_err(HandlerErr::db_query)
}

fn plans_list(conn: &Connection) -> Result<serde_json::Value, HandlerErr> {
    Ok(json!({ "plans": list_plans(conn)? }))
}

fn plans_create(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let name = get_required_text(params, "name", 2)?;
    let price = get_required_f64(params, "price")?;
    if price <= 0.0 {
        return Err(HandlerErr::validation("price must be greater than 0")
            .with_details(json!({ "price": price })));
    }
    let description = get_optional_str(params, "description")?;
    let active = params.get("active").and_then(|v| v.as_bool()).unwrap_or(true);
    let created_at = chrono::Local::now().format("%Y-%m-%d").to_string();

    let id = Uuid::new_v4().to_string();
    let sort_order = db::next_sort_order(conn, "payment_plans").map_err(HandlerErr::db_query)?;
    conn.execute(
        "INSERT INTO payment_plans(id, name, price, description, active, created_at, sort_order)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        (&id, &name, price, &description, active as i64, &created_at, sort_order),
    )
    .map_err(|e| HandlerErr::db_update(e, "payment_plans"))?;
    tracing::info!(plan_id = %id, "payment plan created");
    Ok(json!({ "plan": find_plan(conn, &id)? }))
}

fn plans_toggle(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let plan_id = get_required_str(params, "planId")?;
    let plan = find_plan(conn, &plan_id)?;
    let active = match params.get("active") {
        Some(v) => v
            .as_bool()
            .ok_or_else(|| HandlerErr::bad_params("active must be boolean"))?,
        None => !plan.active,
    };
    conn.execute(
        "UPDATE payment_plans SET active = ? WHERE id = ?",
        (active as i64, &plan_id),
    )
    .map_err(|e| HandlerErr::db_update(e, "payment_plans"))?;
    Ok(json!({ "planId": plan_id, "active": active }))
}

/// Registered payments keep their plan name snapshot.
fn plans_delete(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let plan_id = get_required_str(params, "planId")?;
    find_plan(conn, &plan_id)?;
    conn.execute("DELETE FROM payment_plans WHERE id = ?", [&plan_id])
        .map_err(|e| HandlerErr::db_update(e, "payment_plans"))?;
    Ok(json!({ "ok": true }))
}

fn payments_list(conn: &Connection) -> Result<serde_json::Value, HandlerErr> {
    let payments = list_payments(conn)?;
    let settings = setup::payment_settings(conn)?;
    let total: f64 = payments.iter().map(|p| p.amount).sum();
    Ok(json!({
        "payments": payments,
        "total": total,
        "currency": settings.currency,
        "dollarRate": settings.dollar_rate,
        "totalLocal": crate::calc::round_off_2_decimals(total * settings.dollar_rate)
    }))
}

fn payments_register(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let plan_id = get_required_str(params, "planId")?;
    let amount = get_required_f64(params, "amount")?;
    if amount < 1.0 {
        return Err(HandlerErr::validation("amount must be at least 1")
            .with_details(json!({ "amount": amount })));
    }
    let method = get_required_text(params, "method", 1)?;
    let date = get_required_date(params, "date")?;
    let student = find_student(conn, &student_id)?;
    let plan = find_plan(conn, &plan_id)?;
    if !plan.active {
        return Err(HandlerErr::validation("payment plan is inactive")
            .with_details(json!({ "planId": plan.id })));
    }

    let payment = PaymentRow {
        id: Uuid::new_v4().to_string(),
        student_id: student.id,
        student_name: student.full_name,
        plan_id: plan.id,
        plan_name: plan.name,
        amount,
        method,
        date,
        time: chrono::Local::now().format("%H:%M").to_string(),
    };
    let sort_order = db::next_sort_order(conn, "payments").map_err(HandlerErr::db_query)?;
    conn.execute(
        "INSERT INTO payments(id, student_id, student_name, plan_id, plan_name, amount, method, date, time, sort_order)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &payment.id,
            &payment.student_id,
            &payment.student_name,
            &payment.plan_id,
            &payment.plan_name,
            payment.amount,
            &payment.method,
            &payment.date,
            &payment.time,
            sort_order,
        ),
    )
    .map_err(|e| HandlerErr::db_update(e, "payments"))?;
    tracing::info!(payment_id = %payment.id, student_id = %payment.student_id, "payment registered");
    Ok(json!({ "payment": payment }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "payments.plans.list" => Some(respond(state, req, |conn, _| plans_list(conn))),
        "payments.plans.create" => Some(respond(state, req, plans_create)),
        "payments.plans.toggle" => Some(respond(state, req, plans_toggle)),
        "payments.plans.delete" => Some(respond(state, req, plans_delete)),
        "payments.list" => Some(respond(state, req, |conn, _| payments_list(conn))),
        "payments.register" => Some(respond(state, req, payments_register)),
        _ => None,
    }
}
