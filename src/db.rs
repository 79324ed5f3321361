use rusqlite::{Connection, OptionalExtension};

const TABLES: [&str; 11] = [
    "settings",
    "students",
    "teachers",
    "courses",
    "catalog_items",
    "evaluations",
    "grades",
    "schedule_cells",
    "payment_plans",
    "payments",
    "calendar_events",
];

pub const CATALOG_KINDS: [&str; 3] = ["strategy", "technique", "instrument"];

const CATALOG_DEFAULTS: [(&str, &[&str]); 3] = [
    (
        "strategy",
        &["Escrita", "Práctica", "Proyecto", "Oral", "Observación"],
    ),
    (
        "technique",
        &[
            "Prueba",
            "Entrevista",
            "Prueba de ejecución",
            "Guía de trabajo",
            "Observación sistemática",
        ],
    ),
    (
        "instrument",
        &[
            "Cuestionario",
            "Registro anecdótico",
            "Escala de estimación",
            "Lista de cotejo",
            "Rúbrica",
        ],
    ),
];

/// Opens the session store. It lives in memory only: closing the process
/// discards every record.
pub fn open_store() -> anyhow::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;
    create_schema(&conn)?;
    seed_catalog_defaults(&conn)?;
    Ok(conn)
}

fn create_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            full_name TEXT NOT NULL,
            external_id TEXT NOT NULL,
            sort_order INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS teachers(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            sort_order INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS courses(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            teacher_id TEXT,
            sort_order INTEGER NOT NULL,
            FOREIGN KEY(teacher_id) REFERENCES teachers(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_courses_teacher ON courses(teacher_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS catalog_items(
            kind TEXT NOT NULL,
            name TEXT NOT NULL,
            sort_order INTEGER NOT NULL,
            PRIMARY KEY(kind, name)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS evaluations(
            id TEXT PRIMARY KEY,
            course_id TEXT NOT NULL,
            title TEXT NOT NULL,
            weight REAL NOT NULL,
            period INTEGER NOT NULL,
            date TEXT NOT NULL,
            strategy TEXT NOT NULL,
            content TEXT NOT NULL,
            technique TEXT NOT NULL,
            instrument TEXT NOT NULL,
            sort_order INTEGER NOT NULL,
            FOREIGN KEY(course_id) REFERENCES courses(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_evaluations_course_period ON evaluations(course_id, period)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS grades(
            student_id TEXT NOT NULL,
            evaluation_id TEXT NOT NULL,
            value REAL NOT NULL,
            updated_at TEXT,
            PRIMARY KEY(student_id, evaluation_id),
            FOREIGN KEY(student_id) REFERENCES students(id),
            FOREIGN KEY(evaluation_id) REFERENCES evaluations(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_grades_evaluation ON grades(evaluation_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS schedule_cells(
            day TEXT NOT NULL,
            timeslot TEXT NOT NULL,
            course_id TEXT NOT NULL,
            course_name TEXT NOT NULL,
            teacher_name TEXT NOT NULL,
            PRIMARY KEY(day, timeslot)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS payment_plans(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            price REAL NOT NULL,
            description TEXT,
            active INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            sort_order INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS payments(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            student_name TEXT NOT NULL,
            plan_id TEXT NOT NULL,
            plan_name TEXT NOT NULL,
            amount REAL NOT NULL,
            method TEXT NOT NULL,
            date TEXT NOT NULL,
            time TEXT NOT NULL,
            sort_order INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS calendar_events(
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            date TEXT NOT NULL,
            course_id TEXT,
            editable INTEGER NOT NULL,
            sort_order INTEGER NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_calendar_events_course ON calendar_events(course_id)",
        [],
    )?;

    Ok(())
}

/// Wipes every record, leaving an empty schema behind.
pub fn reset_store(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("PRAGMA foreign_keys = OFF", [])?;
    for table in TABLES {
        conn.execute(&format!("DELETE FROM {}", table), [])?;
    }
    conn.execute("PRAGMA foreign_keys = ON", [])?;
    seed_catalog_defaults(conn)?;
    Ok(())
}

fn seed_catalog_defaults(conn: &Connection) -> anyhow::Result<()> {
    for (kind, names) in CATALOG_DEFAULTS {
        for (i, name) in names.iter().enumerate() {
            conn.execute(
                "INSERT OR IGNORE INTO catalog_items(kind, name, sort_order) VALUES(?, ?, ?)",
                (kind, name, i as i64),
            )?;
        }
    }
    Ok(())
}

pub fn settings_get_json(conn: &Connection, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row("SELECT value FROM settings WHERE key = ?", [key], |r| {
            r.get(0)
        })
        .optional()?;
    match raw {
        Some(s) => Ok(Some(serde_json::from_str(&s)?)),
        None => Ok(None),
    }
}

pub fn settings_set_json(
    conn: &Connection,
    key: &str,
    value: &serde_json::Value,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        (key, serde_json::to_string(value)?),
    )?;
    Ok(())
}

/// Next `sort_order` for append-ordered tables.
pub fn next_sort_order(conn: &Connection, table: &str) -> rusqlite::Result<i64> {
    conn.query_row(
        &format!("SELECT COALESCE(MAX(sort_order), -1) + 1 FROM {}", table),
        [],
        |r| r.get(0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_roundtrip_and_overwrite() {
        let conn = open_store().expect("open store");
        assert!(settings_get_json(&conn, "setup.grading").unwrap().is_none());
        settings_set_json(&conn, "setup.grading", &serde_json::json!({ "periodCount": 3 }))
            .unwrap();
        settings_set_json(&conn, "setup.grading", &serde_json::json!({ "periodCount": 4 }))
            .unwrap();
        assert_eq!(
            settings_get_json(&conn, "setup.grading").unwrap(),
            Some(serde_json::json!({ "periodCount": 4 }))
        );
    }

    #[test]
    fn reset_clears_rows() {
        let conn = open_store().expect("open store");
        conn.execute(
            "INSERT INTO students(id, full_name, external_id, sort_order) VALUES('s1', 'Ana', '1', 0)",
            [],
        )
        .unwrap();
        assert_eq!(next_sort_order(&conn, "students").unwrap(), 1);
        reset_store(&conn).unwrap();
        let n: i64 = conn
            .query_row("SELECT COUNT(*) FROM students", [], |r| r.get(0))
            .unwrap();
        assert_eq!(n, 0);
        assert_eq!(next_sort_order(&conn, "students").unwrap(), 0);
        let catalog: i64 = conn
            .query_row("SELECT COUNT(*) FROM catalog_items", [], |r| r.get(0))
            .unwrap();
        assert_eq!(catalog, 15);
    }
}
