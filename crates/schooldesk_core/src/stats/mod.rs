//! Derived dashboard statistics.
//!
//! # Responsibility
//! - Define named stat entries as pure functions of collection snapshots and
//!   the current date.
//! - Provide the default dashboard summary entries.
//!
//! # Invariants
//! - Entries hold no state; equal inputs always produce equal values.
//! - A missing dependency collection is treated as empty.

use crate::collections::{APPLICATIONS, EVENTS, FEES, NOTICES, STUDENTS, TEACHERS};
use crate::model::record::Record;
use crate::store::Snapshot;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

mod aggregator;

pub use aggregator::StatsAggregator;

pub const TOTAL_STUDENTS: &str = "totalStudents";
pub const TOTAL_TEACHERS: &str = "totalTeachers";
pub const ACTIVE_NOTICES: &str = "activeNotices";
pub const UPCOMING_EVENTS: &str = "upcomingEvents";
pub const TODAY_EVENTS: &str = "todayEvents";
pub const COLLECTION_RATE: &str = "collectionRate";
pub const PENDING_APPLICATIONS: &str = "pendingApplications";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// One derived scalar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StatValue {
    Count(usize),
    /// Percentage in `0.0..=100.0`, rounded to one decimal.
    Percent(f64),
}

impl fmt::Display for StatValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Count(value) => write!(f, "{value}"),
            Self::Percent(value) => write!(f, "{value:.1}%"),
        }
    }
}

/// Inputs visible to stat entries during one computation.
pub struct StatContext<'a> {
    snapshots: &'a BTreeMap<String, Snapshot>,
    today: NaiveDate,
}

impl<'a> StatContext<'a> {
    pub fn new(snapshots: &'a BTreeMap<String, Snapshot>, today: NaiveDate) -> Self {
        Self { snapshots, today }
    }

    /// Records of `collection`; empty when it was not provided.
    pub fn records(&self, collection: &str) -> &'a [Record] {
        self.snapshots
            .get(collection)
            .map(|snapshot| snapshot.records())
            .unwrap_or(&[])
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }
}

/// Named pure function producing one dashboard value.
#[derive(Clone, Copy)]
pub struct StatEntry {
    pub name: &'static str,
    pub dependencies: &'static [&'static str],
    pub compute: fn(&StatContext<'_>) -> StatValue,
}

impl StatEntry {
    pub fn evaluate(&self, context: &StatContext<'_>) -> StatValue {
        (self.compute)(context)
    }
}

/// Computed values at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub values: BTreeMap<&'static str, StatValue>,
    /// Date the time-relative entries were evaluated against.
    pub as_of: NaiveDate,
    /// Versions of the dependency snapshots used.
    pub versions: BTreeMap<String, u64>,
}

impl StatsSnapshot {
    pub fn empty(as_of: NaiveDate) -> Self {
        Self {
            values: BTreeMap::new(),
            as_of,
            versions: BTreeMap::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<StatValue> {
        self.values.get(name).copied()
    }

    /// Count value of `name`; `0` when absent or not a count.
    pub fn count(&self, name: &str) -> usize {
        match self.get(name) {
            Some(StatValue::Count(value)) => value,
            _ => 0,
        }
    }

    /// Percent value of `name`; `0.0` when absent or not a percentage.
    pub fn percent(&self, name: &str) -> f64 {
        match self.get(name) {
            Some(StatValue::Percent(value)) => value,
            _ => 0.0,
        }
    }

    pub fn total_students(&self) -> usize {
        self.count(TOTAL_STUDENTS)
    }

    pub fn total_teachers(&self) -> usize {
        self.count(TOTAL_TEACHERS)
    }

    pub fn active_notices(&self) -> usize {
        self.count(ACTIVE_NOTICES)
    }

    pub fn upcoming_events(&self) -> usize {
        self.count(UPCOMING_EVENTS)
    }

    pub fn today_events(&self) -> usize {
        self.count(TODAY_EVENTS)
    }

    pub fn collection_rate(&self) -> f64 {
        self.percent(COLLECTION_RATE)
    }

    pub fn pending_applications(&self) -> usize {
        self.count(PENDING_APPLICATIONS)
    }
}

/// Evaluates `entries` against `context`.
pub fn compute_stats(entries: &[StatEntry], context: &StatContext<'_>) -> StatsSnapshot {
    let values = entries
        .iter()
        .map(|entry| (entry.name, entry.evaluate(context)))
        .collect();
    let versions = context
        .snapshots
        .iter()
        .map(|(name, snapshot)| (name.clone(), snapshot.version()))
        .collect();
    StatsSnapshot {
        values,
        as_of: context.today,
        versions,
    }
}

/// Dashboard summary entries.
pub fn default_entries() -> Vec<StatEntry> {
    vec![
        StatEntry {
            name: TOTAL_STUDENTS,
            dependencies: &[STUDENTS],
            compute: |context| StatValue::Count(context.records(STUDENTS).len()),
        },
        StatEntry {
            name: TOTAL_TEACHERS,
            dependencies: &[TEACHERS],
            compute: |context| StatValue::Count(context.records(TEACHERS).len()),
        },
        StatEntry {
            name: ACTIVE_NOTICES,
            dependencies: &[NOTICES],
            compute: active_notices,
        },
        StatEntry {
            name: UPCOMING_EVENTS,
            dependencies: &[EVENTS],
            compute: |context| {
                let today = context.today();
                StatValue::Count(count_where(context.records(EVENTS), |record| {
                    record_date(record, "date").is_some_and(|date| date >= today)
                }))
            },
        },
        StatEntry {
            name: TODAY_EVENTS,
            dependencies: &[EVENTS],
            compute: |context| {
                let today = context.today();
                StatValue::Count(count_where(context.records(EVENTS), |record| {
                    record_date(record, "date") == Some(today)
                }))
            },
        },
        StatEntry {
            name: COLLECTION_RATE,
            dependencies: &[FEES],
            compute: collection_rate,
        },
        StatEntry {
            name: PENDING_APPLICATIONS,
            dependencies: &[APPLICATIONS],
            compute: |context| {
                StatValue::Count(count_where(context.records(APPLICATIONS), |record| {
                    record.get_str("status") == Some("pending")
                }))
            },
        },
    ]
}

fn active_notices(context: &StatContext<'_>) -> StatValue {
    let today = context.today();
    StatValue::Count(count_where(context.records(NOTICES), |record| {
        let status_active = record.get_str("status").map_or(true, |status| status == "active");
        let not_expired = record_date(record, "expiryDate").map_or(true, |expiry| expiry >= today);
        status_active && not_expired
    }))
}

fn collection_rate(context: &StatContext<'_>) -> StatValue {
    let fees = context.records(FEES);
    if fees.is_empty() {
        return StatValue::Percent(0.0);
    }
    let paid = count_where(fees, |record| record.get_str("status") == Some("paid"));
    let rate = paid as f64 / fees.len() as f64 * 100.0;
    StatValue::Percent((rate * 10.0).round() / 10.0)
}

fn count_where(records: &[Record], predicate: impl Fn(&Record) -> bool) -> usize {
    records.iter().filter(|record| predicate(record)).count()
}

/// Parses a `YYYY-MM-DD` field, tolerating a trailing time component.
fn record_date(record: &Record, field: &str) -> Option<NaiveDate> {
    let raw = record.get_str(field)?;
    let date_part = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(date_part, DATE_FORMAT).ok()
}
