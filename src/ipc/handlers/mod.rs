pub mod calendar;
pub mod core;
pub mod courses;
pub mod evaluations;
pub mod grades;
pub mod payments;
pub mod reports;
pub mod schedule;
pub mod setup;
pub mod students;
