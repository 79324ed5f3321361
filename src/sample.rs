//! Demo data matching what the school screens show on first load.

use anyhow::Context;
use rusqlite::Connection;
use serde::Serialize;
use uuid::Uuid;

const TEACHERS: [&str; 4] = ["Prof. Sánchez", "Prof. García", "Prof. López", "Prof. Díaz"];

/// (course, teacher index)
const COURSES: [(&str, Option<usize>); 5] = [
    ("Matemáticas", Some(0)),
    ("Física", Some(1)),
    ("Historia", Some(2)),
    ("Química", Some(3)),
    ("Ciencias Naturales", None),
];

const STUDENTS: [(&str, &str); 3] = [
    ("María Rodríguez", "12345678"),
    ("Carlos Gómez", "87654321"),
    ("Ana Pérez", "11223344"),
];

struct SampleEvaluation {
    title: &'static str,
    weight: f64,
    period: i64,
    date: &'static str,
    strategy: &'static str,
    content: &'static str,
    technique: &'static str,
    instrument: &'static str,
}

const MATH_PLAN: [SampleEvaluation; 3] = [
    SampleEvaluation {
        title: "Examen 1",
        weight: 40.0,
        period: 1,
        date: "2025-10-20",
        strategy: "Escrita",
        content: "Unidad I: Álgebra",
        technique: "Prueba",
        instrument: "Cuestionario",
    },
    SampleEvaluation {
        title: "Taller 1",
        weight: 60.0,
        period: 1,
        date: "2025-11-15",
        strategy: "Práctica",
        content: "Unidad I: Gráficas",
        technique: "Prueba de ejecución",
        instrument: "Guía de trabajo",
    },
    SampleEvaluation {
        title: "Proyecto Final",
        weight: 100.0,
        period: 2,
        date: "2026-03-01",
        strategy: "Proyecto",
        content: "Unidad II: Vectores",
        technique: "Demostración",
        instrument: "Rúbrica",
    },
];

/// (name, price, description, active, created_at)
const PLANS: [(&str, f64, &str, bool, &str); 3] = [
    ("Mensualidad Enero", 50.0, "Pago de la mensualidad de enero.", true, "2025-01-01"),
    ("Mensualidad Febrero", 50.0, "Pago de la mensualidad de febrero.", true, "2025-02-01"),
    ("Inscripción Anual", 200.0, "Costo de la inscripción para el año escolar.", false, "2024-12-01"),
];

/// (student index, plan index, amount, method, date, time)
const PAYMENTS: [(usize, usize, f64, &str, &str, &str); 3] = [
    (0, 0, 50.0, "Transferencia", "2025-01-05", "10:30"),
    (1, 0, 50.0, "Pago Móvil", "2025-01-10", "09:00"),
    (2, 2, 200.0, "Tarjeta de Crédito", "2024-12-15", "15:45"),
];

/// (title, date, course index)
const EVENTS: [(&str, &str, usize); 4] = [
    ("Taller de Álgebra", "2025-09-20", 0),
    ("Examen de Leyes de Newton", "2025-09-25", 1),
    ("Debate sobre la I Guerra Mundial", "2025-10-05", 2),
    ("Examen de Nomenclatura", "2025-10-10", 3),
];

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleSummary {
    pub teachers: usize,
    pub courses: usize,
    pub students: usize,
    pub evaluations: usize,
    pub payment_plans: usize,
    pub payments: usize,
    pub calendar_events: usize,
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Inserts the demo records. Expects an empty store.
pub fn seed_sample(conn: &Connection) -> anyhow::Result<SampleSummary> {
    let tx = conn
        .unchecked_transaction()
        .context("failed to begin sample transaction")?;
    let mut summary = SampleSummary::default();

    let mut teacher_ids = Vec::new();
    for (i, name) in TEACHERS.iter().enumerate() {
        let id = new_id();
        tx.execute(
            "INSERT INTO teachers(id, name, sort_order) VALUES(?, ?, ?)",
            (&id, name, i as i64),
        )
        .context("failed to insert sample teacher")?;
        teacher_ids.push(id);
        summary.teachers += 1;
    }

    let mut course_ids = Vec::new();
    for (i, (name, teacher)) in COURSES.iter().enumerate() {
        let id = new_id();
        let teacher_id = teacher.map(|t| teacher_ids[t].clone());
        tx.execute(
            "INSERT INTO courses(id, name, teacher_id, sort_order) VALUES(?, ?, ?, ?)",
            (&id, name, teacher_id, i as i64),
        )
        .context("failed to insert sample course")?;
        course_ids.push(id);
        summary.courses += 1;
    }

    let mut student_ids = Vec::new();
    for (i, (name, external_id)) in STUDENTS.iter().enumerate() {
        let id = new_id();
        tx.execute(
            "INSERT INTO students(id, full_name, external_id, sort_order) VALUES(?, ?, ?, ?)",
            (&id, name, external_id, i as i64),
        )
        .context("failed to insert sample student")?;
        student_ids.push(id);
        summary.students += 1;
    }

    for (i, e) in MATH_PLAN.iter().enumerate() {
        tx.execute(
            "INSERT INTO evaluations(id, course_id, title, weight, period, date, strategy, content, technique, instrument, sort_order)
             VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            (
                new_id(),
                &course_ids[0],
                e.title,
                e.weight,
                e.period,
                e.date,
                e.strategy,
                e.content,
                e.technique,
                e.instrument,
                i as i64,
            ),
        )
        .context("failed to insert sample evaluation")?;
        summary.evaluations += 1;
    }

    let mut plan_ids = Vec::new();
    for (i, (name, price, description, active, created_at)) in PLANS.iter().enumerate() {
        let id = new_id();
        tx.execute(
            "INSERT INTO payment_plans(id, name, price, description, active, created_at, sort_order)
             VALUES(?, ?, ?, ?, ?, ?, ?)",
            (&id, name, price, description, *active as i64, created_at, i as i64),
        )
        .context("failed to insert sample payment plan")?;
        plan_ids.push(id);
        summary.payment_plans += 1;
    }

    for (i, (student, plan, amount, method, date, time)) in PAYMENTS.iter().enumerate() {
        tx.execute(
            "INSERT INTO payments(id, student_id, student_name, plan_id, plan_name, amount, method, date, time, sort_order)
             VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            (
                new_id(),
                &student_ids[*student],
                STUDENTS[*student].0,
                &plan_ids[*plan],
                PLANS[*plan].0,
                amount,
                method,
                date,
                time,
                i as i64,
            ),
        )
        .context("failed to insert sample payment")?;
        summary.payments += 1;
    }

    for (i, (title, date, course)) in EVENTS.iter().enumerate() {
        tx.execute(
            "INSERT INTO calendar_events(id, title, date, course_id, editable, sort_order)
             VALUES(?, ?, ?, ?, 0, ?)",
            (new_id(), title, date, &course_ids[*course], i as i64),
        )
        .context("failed to insert sample calendar event")?;
        summary.calendar_events += 1;
    }

    tx.commit().context("failed to commit sample data")?;
    Ok(summary)
}
