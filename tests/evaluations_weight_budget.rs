mod test_support;

use serde_json::json;
use test_support::{spawn_sidecar, Sidecar};

fn course(sc: &mut Sidecar) -> String {
    sc.request_ok("courses.create", json!({ "name": "Física" }))["courseId"]
        .as_str()
        .expect("courseId")
        .to_string()
}

fn eval_params(course_id: &str, title: &str, weight: serde_json::Value, period: i64) -> serde_json::Value {
    json!({
        "courseId": course_id,
        "title": title,
        "weight": weight,
        "period": period,
        "date": "2025-11-15",
        "strategy": "Práctica",
        "content": "Leyes de Newton",
        "technique": "Prueba de ejecución",
        "instrument": "Guía de trabajo"
    })
}

#[test]
fn insert_past_100_percent_is_rejected() {
    let mut sc = spawn_sidecar();
    let course_id = course(&mut sc);

    let first = sc.request_ok("evaluations.create", eval_params(&course_id, "Taller 1", json!(60), 1));
    assert_eq!(first["weightTotal"], 60.0);

    let (code, error) = sc.request_err(
        "evaluations.create",
        eval_params(&course_id, "Taller 2", json!(50), 1),
    );
    assert_eq!(code, "validation_failed");
    assert_eq!(error["details"]["currentTotal"], 60.0);

    // Another period has its own budget.
    sc.request_ok("evaluations.create", eval_params(&course_id, "Taller 2", json!(50), 2));
    let exact = sc.request_ok("evaluations.create", eval_params(&course_id, "Taller 3", json!("40"), 1));
    assert_eq!(exact["weightTotal"], 100.0);

    let list = sc.request_ok("evaluations.list", json!({ "courseId": course_id, "period": 1 }));
    assert_eq!(list["evaluations"].as_array().map(|a| a.len()), Some(2));
    assert_eq!(list["periods"][0]["remaining"], 0.0);
}

#[test]
fn budgets_are_per_course() {
    let mut sc = spawn_sidecar();
    let a = course(&mut sc);
    let b = course(&mut sc);
    sc.request_ok("evaluations.create", eval_params(&a, "Examen", json!(100), 1));
    sc.request_ok("evaluations.create", eval_params(&b, "Examen", json!(100), 1));
}

#[test]
fn field_validation() {
    let mut sc = spawn_sidecar();
    let course_id = course(&mut sc);

    for weight in [json!(0), json!(101), json!("abc")] {
        let (code, _) = sc.request_err(
            "evaluations.create",
            eval_params(&course_id, "Taller", weight, 1),
        );
        assert_eq!(code, "validation_failed");
    }

    let (code, _) = sc.request_err("evaluations.create", eval_params(&course_id, "Taller", json!(10), 4));
    assert_eq!(code, "validation_failed");

    let mut missing = eval_params(&course_id, "Taller", json!(10), 1);
    missing["instrument"] = json!("   ");
    let (code, error) = sc.request_err("evaluations.create", missing);
    assert_eq!(code, "validation_failed");
    assert_eq!(error["details"]["field"], "instrument");

    let mut bad_date = eval_params(&course_id, "Taller", json!(10), 1);
    bad_date["date"] = json!("15/11/2025");
    let (code, _) = sc.request_err("evaluations.create", bad_date);
    assert_eq!(code, "validation_failed");

    let (code, _) = sc.request_err(
        "evaluations.create",
        eval_params("missing-course", "Taller", json!(10), 1),
    );
    assert_eq!(code, "not_found");
}

#[test]
fn edits_report_overspent_periods_without_rejecting() {
    let mut sc = spawn_sidecar();
    let course_id = course(&mut sc);
    let first = sc.request_ok("evaluations.create", eval_params(&course_id, "Taller 1", json!(40), 1));
    sc.request_ok("evaluations.create", eval_params(&course_id, "Taller 2", json!(60), 1));

    let id = first["evaluationId"].as_str().expect("id").to_string();
    let updated = sc.request_ok(
        "evaluations.update",
        json!({ "evaluationId": id, "patch": { "weight": 70 } }),
    );
    assert_eq!(updated["weightTotal"], 130.0);
    assert_eq!(updated["overBudget"], true);

    // Once over budget, further inserts into the period are refused.
    let (code, _) = sc.request_err("evaluations.create", eval_params(&course_id, "Taller 3", json!(1), 1));
    assert_eq!(code, "validation_failed");

    let removed = sc.request_ok("evaluations.delete", json!({ "evaluationId": id }));
    assert_eq!(removed["gradesRemoved"], 0);
    let list = sc.request_ok("evaluations.list", json!({ "courseId": course_id }));
    assert_eq!(list["periods"][0]["weightTotal"], 60.0);
}
