//! Well-known dashboard collection names.

pub const STUDENTS: &str = "students";
pub const TEACHERS: &str = "teachers";
pub const NOTICES: &str = "notices";
pub const EVENTS: &str = "events";
pub const FEES: &str = "fees";
pub const APPLICATIONS: &str = "applications";

/// Every collection seeded with sample data by default.
pub const ALL: &[&str] = &[STUDENTS, TEACHERS, NOTICES, EVENTS, FEES, APPLICATIONS];
