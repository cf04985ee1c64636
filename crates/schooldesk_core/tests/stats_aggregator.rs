use chrono::NaiveDate;
use schooldesk_core::collections::{APPLICATIONS, EVENTS, FEES, NOTICES, STUDENTS};
use schooldesk_core::sample::{self, seed_defaults};
use schooldesk_core::stats::{default_entries, StatContext, TOTAL_STUDENTS};
use schooldesk_core::{
    patch, ManualClock, MemoryStorage, Record, StatEntry, StatValue, StatsAggregator,
    StorageHandle, Store, StoreConfig,
};
use serde_json::json;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

fn start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
}

fn store_with_clock() -> (Store, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::at_date(start_date()));
    let store = Store::with_clock(
        StorageHandle::new(MemoryStorage::new()),
        StoreConfig::default(),
        clock.clone(),
    );
    (store, clock)
}

#[test]
fn sample_data_produces_expected_dashboard() {
    let (store, _clock) = store_with_clock();
    seed_defaults(&store, start_date()).unwrap();

    let aggregator = StatsAggregator::with_entries(&store, default_entries(), None).unwrap();
    let stats = aggregator.stats();

    assert_eq!(stats.as_of, start_date());
    assert_eq!(stats.total_students(), 3);
    assert_eq!(stats.total_teachers(), 3);
    assert_eq!(stats.active_notices(), 2);
    assert_eq!(stats.upcoming_events(), 2);
    assert_eq!(stats.today_events(), 1);
    assert_eq!(stats.collection_rate(), 66.7);
    assert_eq!(stats.pending_applications(), 1);
    assert!(!aggregator.is_polling());
}

#[test]
fn total_students_tracks_every_mutation() {
    let (store, _clock) = store_with_clock();
    let aggregator = StatsAggregator::with_entries(&store, default_entries(), None).unwrap();
    assert_eq!(aggregator.stats().total_students(), 0);

    for index in 0..5 {
        store
            .add(STUDENTS, Record::new(format!("s-{index}")))
            .unwrap();
        assert_eq!(
            aggregator.stats().total_students(),
            store.get_all(STUDENTS).unwrap().len()
        );
    }
    store.remove(STUDENTS, "s-2").unwrap();
    assert_eq!(aggregator.stats().total_students(), 4);
    assert_eq!(aggregator.stats().versions.get(STUDENTS), Some(&6));
}

#[test]
fn status_changes_update_dependent_stats() {
    let (store, _clock) = store_with_clock();
    store.ensure_seeded(FEES, sample::fees).unwrap();
    store.ensure_seeded(APPLICATIONS, sample::applications).unwrap();
    let aggregator = StatsAggregator::with_entries(&store, default_entries(), None).unwrap();

    store
        .update(FEES, "fee-003", &patch([("status", json!("paid"))]))
        .unwrap();
    store
        .update(APPLICATIONS, "app-001", &patch([("status", json!("approved"))]))
        .unwrap();

    let stats = aggregator.stats();
    assert_eq!(stats.collection_rate(), 100.0);
    assert_eq!(stats.pending_applications(), 0);
}

#[test]
fn refresh_picks_up_date_rollover() {
    let (store, clock) = store_with_clock();
    store
        .ensure_seeded(EVENTS, || sample::events(start_date()))
        .unwrap();
    store
        .ensure_seeded(NOTICES, || sample::notices(start_date()))
        .unwrap();
    let aggregator = StatsAggregator::with_entries(&store, default_entries(), None).unwrap();
    assert_eq!(aggregator.stats().today_events(), 1);

    clock.advance_ms(DAY_MS);
    assert_eq!(aggregator.stats().today_events(), 1);

    let refreshed = aggregator.refresh();
    assert_eq!(refreshed.as_of, start_date().succ_opt().unwrap());
    assert_eq!(refreshed.today_events(), 0);
    assert_eq!(refreshed.upcoming_events(), 1);

    clock.advance_ms(5 * DAY_MS);
    assert_eq!(aggregator.refresh().active_notices(), 1);
}

#[test]
fn polling_recomputes_without_mutations() {
    let (store, clock) = store_with_clock();
    store
        .ensure_seeded(EVENTS, || sample::events(start_date()))
        .unwrap();
    let aggregator = StatsAggregator::with_entries(
        &store,
        default_entries(),
        Some(Duration::from_millis(10)),
    )
    .unwrap();
    assert!(aggregator.is_polling());
    assert_eq!(aggregator.stats().today_events(), 1);

    clock.advance_ms(DAY_MS);
    let deadline = Instant::now() + Duration::from_secs(2);
    while aggregator.stats().today_events() != 0 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(aggregator.stats().today_events(), 0);

    aggregator.stop();
    assert_eq!(store.subscriber_count(EVENTS), 0);
}

#[test]
fn custom_entries_only_subscribe_to_their_dependencies() {
    fn honor_roll(context: &StatContext<'_>) -> StatValue {
        StatValue::Count(
            context
                .records(STUDENTS)
                .iter()
                .filter(|record| record.get_f64("gpa").is_some_and(|gpa| gpa >= 4.5))
                .count(),
        )
    }

    let (store, _clock) = store_with_clock();
    let entries = vec![StatEntry {
        name: "honorRoll",
        dependencies: &[STUDENTS],
        compute: honor_roll,
    }];
    let aggregator = StatsAggregator::with_entries(&store, entries, None).unwrap();
    assert_eq!(store.subscriber_count(STUDENTS), 1);
    assert_eq!(store.subscriber_count(EVENTS), 0);

    store
        .add(STUDENTS, Record::new("s-1").with_field("gpa", 5.0))
        .unwrap();
    store
        .add(STUDENTS, Record::new("s-2").with_field("gpa", 3.8))
        .unwrap();

    let stats = aggregator.stats();
    assert_eq!(stats.count("honorRoll"), 1);
    assert_eq!(stats.get(TOTAL_STUDENTS), None);

    drop(aggregator);
    assert_eq!(store.subscriber_count(STUDENTS), 0);
}
