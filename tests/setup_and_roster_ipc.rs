mod test_support;

use serde_json::json;
use test_support::{spawn_seeded, spawn_sidecar};

#[test]
fn setup_defaults_and_patch_validation() {
    let mut sc = spawn_sidecar();
    let setup = sc.request_ok("setup.get", json!({}));
    assert_eq!(setup["grading"]["periodCount"], 3);
    assert_eq!(setup["schedule"]["collisionScope"], "timeslot");
    assert_eq!(setup["payments"]["dollarRate"], 38.5);

    let updated = sc.request_ok(
        "setup.update",
        json!({ "section": "payments", "patch": { "dollarRate": 40.25, "currency": "usd" } }),
    );
    assert_eq!(updated["value"]["currency"], "USD");

    for (section, patch) in [
        ("grading", json!({ "periodCount": 0 })),
        ("grading", json!({ "unknown": 1 })),
        ("schedule", json!({ "collisionScope": "week" })),
        ("payments", json!({ "dollarRate": -1 })),
    ] {
        let (code, _) = sc.request_err("setup.update", json!({ "section": section, "patch": patch }));
        assert_eq!(code, "validation_failed", "{} {}", section, patch);
    }
    let (code, _) = sc.request_err("setup.update", json!({ "section": "nope", "patch": {} }));
    assert_eq!(code, "bad_params");

    let setup = sc.request_ok("setup.get", json!({}));
    assert_eq!(setup["grading"]["periodCount"], 3);
    assert_eq!(setup["payments"]["dollarRate"], 40.25);
}

#[test]
fn student_roster_crud() {
    let mut sc = spawn_sidecar();
    let created = sc.request_ok(
        "students.create",
        json!({ "fullName": "  Luis Medina ", "externalId": "22334455" }),
    );
    let id = created["studentId"].as_str().expect("id").to_string();

    let (code, _) = sc.request_err("students.create", json!({ "fullName": "L", "externalId": "1" }));
    assert_eq!(code, "validation_failed");
    let (code, _) = sc.request_err(
        "students.create",
        json!({ "fullName": "Otro Luis", "externalId": "22334455" }),
    );
    assert_eq!(code, "validation_failed");

    sc.request_ok(
        "students.update",
        json!({ "studentId": id, "patch": { "fullName": "Luis A. Medina" } }),
    );
    let list = sc.request_ok("students.list", json!({}));
    assert_eq!(list["students"][0]["fullName"], "Luis A. Medina");
    assert_eq!(list["students"][0]["externalId"], "22334455");

    sc.request_ok("students.delete", json!({ "studentId": id }));
    let (code, _) = sc.request_err("students.delete", json!({ "studentId": id }));
    assert_eq!(code, "not_found");
}

#[test]
fn teachers_courses_and_catalog() {
    let mut sc = spawn_seeded();
    let teachers = sc.request_ok("teachers.list", json!({}));
    assert_eq!(teachers["teachers"][1]["name"], "Prof. García");
    assert_eq!(teachers["teachers"][1]["assignedCourses"][0]["name"], "Física");

    let ciencias = sc.find_id("courses.list", "courses", "name", "Ciencias Naturales");
    let diaz = sc.find_id("teachers.list", "teachers", "name", "Prof. Díaz");
    let assigned = sc.request_ok(
        "courses.assignTeacher",
        json!({ "courseId": ciencias, "teacherId": diaz }),
    );
    assert_eq!(assigned["course"]["teacherName"], "Prof. Díaz");

    let removed = sc.request_ok("teachers.delete", json!({ "teacherId": diaz }));
    assert_eq!(removed["coursesUnassigned"], 2);

    let math = sc.find_id("courses.list", "courses", "name", "Matemáticas");
    let dropped = sc.request_ok("courses.delete", json!({ "courseId": math }));
    assert_eq!(dropped["evaluationsRemoved"], 3);

    sc.request_ok("catalog.add", json!({ "kind": "technique", "name": "Portafolio" }));
    let (code, _) = sc.request_err("catalog.add", json!({ "kind": "technique", "name": "Portafolio" }));
    assert_eq!(code, "validation_failed");
    let (code, _) = sc.request_err("catalog.add", json!({ "kind": "color", "name": "Rojo" }));
    assert_eq!(code, "bad_params");
    let catalog = sc.request_ok("catalog.list", json!({}));
    assert_eq!(catalog["technique"][5], "Portafolio");
    sc.request_ok("catalog.remove", json!({ "kind": "technique", "name": "Portafolio" }));
    let (code, _) = sc.request_err("catalog.remove", json!({ "kind": "technique", "name": "Portafolio" }));
    assert_eq!(code, "not_found");
}
