//! Weekly class schedule and the teacher double-booking rule.
//!
//! The schedule is a `day -> timeslot -> course` map holding at most one
//! course per cell. Updates return a new schedule instead of mutating in
//! place, so a rejected assignment leaves the caller's copy untouched.

use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Day {
    Lunes,
    Martes,
    #[serde(rename = "Miércoles")]
    Miercoles,
    Jueves,
    Viernes,
}

pub const DAYS: [Day; 5] = [
    Day::Lunes,
    Day::Martes,
    Day::Miercoles,
    Day::Jueves,
    Day::Viernes,
];

impl Day {
    pub fn label(self) -> &'static str {
        match self {
            Day::Lunes => "Lunes",
            Day::Martes => "Martes",
            Day::Miercoles => "Miércoles",
            Day::Jueves => "Jueves",
            Day::Viernes => "Viernes",
        }
    }

    /// Accepts the Spanish label (with or without accent) or the English
    /// weekday name, case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "lunes" | "monday" => Some(Day::Lunes),
            "martes" | "tuesday" => Some(Day::Martes),
            "miércoles" | "miercoles" | "wednesday" => Some(Day::Miercoles),
            "jueves" | "thursday" => Some(Day::Jueves),
            "viernes" | "friday" => Some(Day::Viernes),
            _ => None,
        }
    }
}

pub const TIMESLOTS: [&str; 4] = [
    "08:00 - 09:30",
    "09:45 - 11:15",
    "11:30 - 13:00",
    "13:15 - 14:45",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timeslot(usize);

fn slot_key(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| match c {
            '\u{2013}' | '\u{2014}' => '-',
            other => other,
        })
        .collect()
}

impl Timeslot {
    pub fn all() -> impl Iterator<Item = Timeslot> {
        (0..TIMESLOTS.len()).map(Timeslot)
    }

    /// Matches a label ignoring spacing and dash style, so
    /// "08:00–09:30" and "08:00 - 09:30" name the same slot.
    pub fn parse(s: &str) -> Option<Self> {
        let key = slot_key(s);
        TIMESLOTS
            .iter()
            .position(|t| slot_key(t) == key)
            .map(Timeslot)
    }

    pub fn label(self) -> &'static str {
        TIMESLOTS[self.0]
    }
}

impl Serialize for Timeslot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Cell {
    pub day: Day,
    pub timeslot: Timeslot,
}

impl Cell {
    pub fn new(day: Day, timeslot: Timeslot) -> Self {
        Self { day, timeslot }
    }
}

/// Course snapshot taken when it is placed on the schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledCourse {
    pub id: String,
    pub name: String,
    pub teacher_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CollisionScope {
    /// Every occurrence of a timeslot during the week counts as the same
    /// moment.
    #[default]
    Timeslot,
    /// Only the candidate's own day is compared.
    Day,
}

impl CollisionScope {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "timeslot" => Some(Self::Timeslot),
            "day" => Some(Self::Day),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Timeslot => "timeslot",
            Self::Day => "day",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Collision {
    pub existing: Cell,
    pub course: ScheduledCourse,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub schedule: Schedule,
    pub replaced: Option<ScheduledCourse>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridRow {
    pub timeslot: Timeslot,
    pub cells: Vec<Option<ScheduledCourse>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schedule {
    days: BTreeMap<Day, BTreeMap<Timeslot, ScheduledCourse>>,
}

impl Schedule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a schedule from stored cells. Later duplicates win.
    pub fn from_cells<I>(cells: I) -> Self
    where
        I: IntoIterator<Item = (Cell, ScheduledCourse)>,
    {
        let mut schedule = Schedule::new();
        for (cell, course) in cells {
            schedule.put(cell, course);
        }
        schedule
    }

    fn put(&mut self, cell: Cell, course: ScheduledCourse) -> Option<ScheduledCourse> {
        self.days
            .entry(cell.day)
            .or_default()
            .insert(cell.timeslot, course)
    }

    pub fn get(&self, cell: Cell) -> Option<&ScheduledCourse> {
        self.days.get(&cell.day).and_then(|d| d.get(&cell.timeslot))
    }

    pub fn len(&self) -> usize {
        self.days.values().map(|d| d.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (Cell, &ScheduledCourse)> + '_ {
        self.days.iter().flat_map(|(day, slots)| {
            slots
                .iter()
                .map(move |(slot, course)| (Cell::new(*day, *slot), course))
        })
    }

    /// Finds an assignment that would double-book the candidate's teacher.
    /// `Timeslot` scans every day at the candidate's timeslot, `Day` only the
    /// candidate cell. The same course already sitting in the candidate cell
    /// is not a collision, so re-submitting an assignment is a no-op.
    pub fn check_collision(
        &self,
        cell: Cell,
        course: &ScheduledCourse,
        scope: CollisionScope,
    ) -> Option<Collision> {
        DAYS.iter()
            .copied()
            .filter(|d| scope == CollisionScope::Timeslot || *d == cell.day)
            .map(|d| Cell::new(d, cell.timeslot))
            .find_map(|c| {
                self.get(c)
                    .filter(|existing| existing.teacher_name == course.teacher_name)
                    .filter(|existing| !(c == cell && existing.id == course.id))
                    .map(|existing| Collision {
                        existing: c,
                        course: existing.clone(),
                    })
            })
    }

    /// Last-write-wins placement. On collision nothing is written.
    pub fn with_assignment(
        &self,
        cell: Cell,
        course: ScheduledCourse,
        scope: CollisionScope,
    ) -> Result<Assignment, Collision> {
        if let Some(collision) = self.check_collision(cell, &course, scope) {
            return Err(collision);
        }
        let mut next = self.clone();
        let replaced = next.put(cell, course);
        Ok(Assignment {
            schedule: next,
            replaced,
        })
    }

    pub fn without(&self, cell: Cell) -> (Schedule, Option<ScheduledCourse>) {
        let mut next = self.clone();
        let removed = next.days.get_mut(&cell.day).and_then(|d| d.remove(&cell.timeslot));
        if next.days.get(&cell.day).map(|d| d.is_empty()).unwrap_or(false) {
            next.days.remove(&cell.day);
        }
        (next, removed)
    }

    /// Timeslot rows by day columns, in `DAYS` order.
    pub fn grid(&self) -> Vec<GridRow> {
        Timeslot::all()
            .map(|slot| GridRow {
                timeslot: slot,
                cells: DAYS
                    .iter()
                    .map(|d| self.get(Cell::new(*d, slot)).cloned())
                    .collect(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn course(id: &str, teacher: &str) -> ScheduledCourse {
        ScheduledCourse {
            id: id.to_string(),
            name: format!("Course {}", id),
            teacher_name: teacher.to_string(),
        }
    }

    fn slot(label: &str) -> Timeslot {
        Timeslot::parse(label).expect("known slot")
    }

    fn monday_garcia() -> Schedule {
        Schedule::from_cells([(
            Cell::new(Day::Lunes, slot("08:00 - 09:30")),
            course("fisica", "Prof. García"),
        )])
    }

    #[test]
    fn timeslot_labels_ignore_dash_style() {
        assert_eq!(slot("08:00–09:30"), slot("08:00 - 09:30"));
        assert_eq!(slot("13:15-14:45").label(), "13:15 - 14:45");
        assert!(Timeslot::parse("07:00 - 08:00").is_none());
    }

    #[test]
    fn day_parse_accepts_accents_and_english() {
        assert_eq!(Day::parse("Miércoles"), Some(Day::Miercoles));
        assert_eq!(Day::parse("miercoles"), Some(Day::Miercoles));
        assert_eq!(Day::parse("FRIDAY"), Some(Day::Viernes));
        assert_eq!(Day::parse("Sábado"), None);
    }

    #[test]
    fn same_teacher_same_slot_other_day_collides() {
        let s = monday_garcia();
        for day in [Day::Martes, Day::Miercoles, Day::Jueves, Day::Viernes] {
            let hit = s
                .check_collision(
                    Cell::new(day, slot("08:00–09:30")),
                    &course("lab", "Prof. García"),
                    CollisionScope::Timeslot,
                )
                .expect("collision");
            assert_eq!(hit.existing.day, Day::Lunes);
            assert_eq!(hit.course.id, "fisica");
        }
    }

    #[test]
    fn other_teacher_same_slot_other_day_is_free() {
        let s = monday_garcia();
        let c = Cell::new(Day::Martes, slot("08:00 - 09:30"));
        assert!(s
            .check_collision(c, &course("mat", "Prof. Sánchez"), CollisionScope::Timeslot)
            .is_none());
    }

    #[test]
    fn same_teacher_other_slot_is_free() {
        let s = monday_garcia();
        let c = Cell::new(Day::Lunes, slot("09:45 - 11:15"));
        assert!(s
            .check_collision(c, &course("lab", "Prof. García"), CollisionScope::Timeslot)
            .is_none());
    }

    #[test]
    fn day_scope_only_compares_candidate_day() {
        let s = monday_garcia();
        let c = Cell::new(Day::Martes, slot("08:00 - 09:30"));
        assert!(s
            .check_collision(c, &course("lab", "Prof. García"), CollisionScope::Day)
            .is_none());
    }

    #[test]
    fn day_scope_rejects_same_teacher_in_the_occupied_cell() {
        let s = monday_garcia();
        let cell = Cell::new(Day::Lunes, slot("08:00 - 09:30"));
        let hit = s
            .check_collision(cell, &course("lab", "Prof. García"), CollisionScope::Day)
            .expect("collision");
        assert_eq!(hit.existing, cell);
        assert_eq!(hit.course.id, "fisica");

        let hits = DAYS
            .iter()
            .flat_map(|d| Timeslot::all().map(move |t| Cell::new(*d, t)))
            .filter(|c| {
                s.check_collision(*c, &course("lab", "Prof. García"), CollisionScope::Day)
                    .is_some()
            })
            .count();
        assert_eq!(hits, 1);

        // The same course again is a re-submission, not a clash.
        assert!(s
            .check_collision(cell, &course("fisica", "Prof. García"), CollisionScope::Day)
            .is_none());
        assert!(s
            .with_assignment(cell, course("hist", "Prof. López"), CollisionScope::Day)
            .is_ok());
    }

    #[test]
    fn timeslot_scope_also_covers_the_candidate_cell() {
        let s = monday_garcia();
        let cell = Cell::new(Day::Lunes, slot("08:00 - 09:30"));
        assert!(s
            .with_assignment(cell, course("lab", "Prof. García"), CollisionScope::Timeslot)
            .is_err());
    }

    #[test]
    fn rejected_assignment_leaves_schedule_unchanged() {
        let s = monday_garcia();
        let before = s.clone();
        let res = s.with_assignment(
            Cell::new(Day::Jueves, slot("08:00 - 09:30")),
            course("lab", "Prof. García"),
            CollisionScope::Timeslot,
        );
        assert!(res.is_err());
        assert_eq!(s, before);
    }

    #[test]
    fn overwrite_is_last_write_wins() {
        let s = monday_garcia();
        let cell = Cell::new(Day::Lunes, slot("08:00 - 09:30"));
        let out = s
            .with_assignment(cell, course("hist", "Prof. López"), CollisionScope::Timeslot)
            .expect("assign");
        assert_eq!(out.replaced.map(|c| c.id), Some("fisica".to_string()));
        assert_eq!(out.schedule.get(cell).map(|c| c.id.as_str()), Some("hist"));
        assert_eq!(out.schedule.len(), 1);
    }

    #[test]
    fn resubmitting_identical_assignment_is_idempotent() {
        let s = monday_garcia();
        let cell = Cell::new(Day::Lunes, slot("08:00 - 09:30"));
        let out = s
            .with_assignment(cell, course("fisica", "Prof. García"), CollisionScope::Timeslot)
            .expect("assign");
        assert_eq!(out.schedule, s);
    }

    #[test]
    fn clearing_a_cell_removes_only_that_cell() {
        let s = monday_garcia()
            .with_assignment(
                Cell::new(Day::Martes, slot("09:45 - 11:15")),
                course("mat", "Prof. Sánchez"),
                CollisionScope::Timeslot,
            )
            .expect("assign")
            .schedule;
        let (next, removed) = s.without(Cell::new(Day::Lunes, slot("08:00 - 09:30")));
        assert_eq!(removed.map(|c| c.id), Some("fisica".to_string()));
        assert_eq!(next.len(), 1);
        let (same, none) = next.without(Cell::new(Day::Viernes, slot("08:00 - 09:30")));
        assert!(none.is_none());
        assert_eq!(same, next);
    }

    #[test]
    fn grid_is_timeslot_rows_by_day_columns() {
        let grid = monday_garcia().grid();
        assert_eq!(grid.len(), TIMESLOTS.len());
        assert_eq!(grid[0].cells.len(), DAYS.len());
        assert_eq!(grid[0].cells[0].as_ref().map(|c| c.id.as_str()), Some("fisica"));
        assert!(grid[1].cells.iter().all(|c| c.is_none()));
    }

    proptest! {
        #[test]
        fn no_teacher_ever_holds_two_cells_in_one_slot(
            ops in prop::collection::vec((0usize..5, 0usize..4, 0usize..3), 0..40)
        ) {
            let teachers = ["Prof. García", "Prof. Sánchez", "Prof. López"];
            let mut s = Schedule::new();
            for (i, (d, t, who)) in ops.into_iter().enumerate() {
                let cell = Cell::new(DAYS[d], Timeslot(t));
                if let Ok(out) = s.with_assignment(
                    cell,
                    course(&i.to_string(), teachers[who]),
                    CollisionScope::Timeslot,
                ) {
                    s = out.schedule;
                }
            }
            for slot in Timeslot::all() {
                let mut seen = std::collections::HashSet::new();
                for day in DAYS {
                    if let Some(c) = s.get(Cell::new(day, slot)) {
                        prop_assert!(seen.insert(c.teacher_name.clone()));
                    }
                }
            }
        }
    }
}
