//! Deterministic sample data for first-run dashboards.
//!
//! # Responsibility
//! - Provide seed factories for every well-known collection.
//! - Seed all of them once through `Store::ensure_seeded`.
//!
//! # Invariants
//! - Factories are deterministic for a given `today`.
//! - Ids are unique within each factory's output.

use crate::collections::{APPLICATIONS, EVENTS, FEES, NOTICES, STUDENTS, TEACHERS};
use crate::model::record::Record;
use crate::store::{SeedOutcome, Store, StoreResult};
use chrono::{Duration, NaiveDate};
use log::info;

const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn students() -> Vec<Record> {
    [
        ("stu-001", "Abdullah Al Mamun", "Class 6", "A", 1),
        ("stu-002", "Fatema Akter", "Class 7", "B", 4),
        ("stu-003", "Tanvir Hasan", "Class 8", "A", 2),
    ]
    .into_iter()
    .map(|(id, name, class, section, roll)| {
        Record::new(id)
            .with_field("name", name)
            .with_field("class", class)
            .with_field("section", section)
            .with_field("roll", roll)
            .with_field("status", "active")
    })
    .collect()
}

pub fn teachers() -> Vec<Record> {
    [
        ("tch-001", "Mahbubur Rahman", "Mathematics"),
        ("tch-002", "Nasrin Sultana", "Bangla"),
        ("tch-003", "Kamrul Islam", "Arabic"),
    ]
    .into_iter()
    .map(|(id, name, subject)| {
        Record::new(id)
            .with_field("name", name)
            .with_field("subject", subject)
            .with_field("status", "active")
    })
    .collect()
}

/// Notices relative to `today`: two active, one already expired.
pub fn notices(today: NaiveDate) -> Vec<Record> {
    vec![
        Record::new("ntc-001")
            .with_field("title", "Half-yearly exam schedule")
            .with_field("status", "active")
            .with_field("expiryDate", format_date(today + Duration::days(14))),
        Record::new("ntc-002")
            .with_field("title", "Parent-teacher meeting")
            .with_field("status", "active")
            .with_field("expiryDate", format_date(today + Duration::days(3))),
        Record::new("ntc-003")
            .with_field("title", "Admission deadline")
            .with_field("status", "active")
            .with_field("expiryDate", format_date(today - Duration::days(1))),
    ]
}

/// Events relative to `today`: one today, one upcoming, one past.
pub fn events(today: NaiveDate) -> Vec<Record> {
    vec![
        Record::new("evt-001")
            .with_field("title", "Morning assembly")
            .with_field("date", format_date(today)),
        Record::new("evt-002")
            .with_field("title", "Annual sports day")
            .with_field("date", format_date(today + Duration::days(10))),
        Record::new("evt-003")
            .with_field("title", "Science fair")
            .with_field("date", format_date(today - Duration::days(7))),
    ]
}

pub fn fees() -> Vec<Record> {
    [
        ("fee-001", "stu-001", 1500, "paid"),
        ("fee-002", "stu-002", 1500, "paid"),
        ("fee-003", "stu-003", 1800, "due"),
    ]
    .into_iter()
    .map(|(id, student_id, amount, status)| {
        Record::new(id)
            .with_field("studentId", student_id)
            .with_field("amount", amount)
            .with_field("status", status)
    })
    .collect()
}

pub fn applications() -> Vec<Record> {
    [
        ("app-001", "Sadia Islam", "Class 6", "pending"),
        ("app-002", "Rafiq Uddin", "Class 9", "approved"),
    ]
    .into_iter()
    .map(|(id, applicant, class, status)| {
        Record::new(id)
            .with_field("applicantName", applicant)
            .with_field("appliedClass", class)
            .with_field("status", status)
    })
    .collect()
}

/// Seeds every well-known collection once.
///
/// Returns the outcome per collection in seeding order.
pub fn seed_defaults(store: &Store, today: NaiveDate) -> StoreResult<Vec<(&'static str, SeedOutcome)>> {
    let outcomes = vec![
        (STUDENTS, store.ensure_seeded(STUDENTS, students)?),
        (TEACHERS, store.ensure_seeded(TEACHERS, teachers)?),
        (NOTICES, store.ensure_seeded(NOTICES, || notices(today))?),
        (EVENTS, store.ensure_seeded(EVENTS, || events(today))?),
        (FEES, store.ensure_seeded(FEES, fees)?),
        (APPLICATIONS, store.ensure_seeded(APPLICATIONS, applications)?),
    ];
    let seeded = outcomes
        .iter()
        .filter(|(_, outcome)| matches!(outcome, SeedOutcome::Seeded { .. }))
        .count();
    info!(
        "event=sample_seed module=sample status=ok collections={} seeded={seeded}",
        outcomes.len()
    );
    Ok(outcomes)
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}
