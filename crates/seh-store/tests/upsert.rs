//! Idempotence of the natural-key upsert across overlapping batches.

use proptest::prelude::*;
use seh_store::{ReadingQuery, Store};
use seh_types::{MeterReading, PowerReading};
use time::{Duration, OffsetDateTime};
use time::macros::datetime;

const BASE: OffsetDateTime = datetime!(2024-06-01 00:00 UTC);

fn power_series(site_id: u64, slots: std::ops::Range<i64>) -> Vec<PowerReading> {
    slots
        .map(|slot| PowerReading {
            site_id,
            timestamp: BASE + Duration::minutes(15 * slot),
            power_watts: (slot * 10) as f64,
        })
        .collect()
}

#[test]
fn overlapping_windows_do_not_duplicate_rows() {
    let mut store = Store::open_in_memory().unwrap();

    // First run covers slots 0..96, the next one re-fetches the last hour.
    store.upsert(&power_series(1, 0..96)).unwrap();
    let before = store
        .query_power(&ReadingQuery::new().site(1).oldest_first())
        .unwrap();

    store.upsert(&power_series(1, 92..120)).unwrap();
    let after = store
        .query_power(&ReadingQuery::new().site(1).oldest_first())
        .unwrap();

    assert_eq!(after.len(), 120);
    assert_eq!(&after[..96], &before[..]);
}

#[test]
fn meter_readings_keyed_per_meter() {
    let mut store = Store::open_in_memory().unwrap();
    let ts = datetime!(2024-06-01 12:00 UTC);
    let readings = vec![
        MeterReading {
            site_id: 1,
            meter_name: "Production".to_string(),
            timestamp: ts,
            energy_wh: Some(100.0),
        },
        MeterReading {
            site_id: 1,
            meter_name: "Consumption".to_string(),
            timestamp: ts,
            energy_wh: None,
        },
    ];

    assert_eq!(store.upsert(&readings).unwrap(), 2);
    assert_eq!(store.upsert(&readings).unwrap(), 2);
    assert_eq!(store.count::<MeterReading>(Some(1)).unwrap(), 2);
}

proptest! {
    #[test]
    fn reapplying_any_window_is_a_no_op(
        first in 0i64..200,
        len in 1i64..100,
        overlap in 0i64..50,
    ) {
        let mut store = Store::open_in_memory().unwrap();
        let initial = power_series(7, first..first + len);
        store.upsert(&initial).unwrap();
        let snapshot = store.query_power(&ReadingQuery::new().oldest_first()).unwrap();

        // Re-fetch a window that starts inside the stored range.
        let replay_start = (first + len - overlap).max(first);
        store.upsert(&power_series(7, replay_start..first + len)).unwrap();

        let replayed = store.query_power(&ReadingQuery::new().oldest_first()).unwrap();
        prop_assert_eq!(replayed, snapshot);
        prop_assert_eq!(store.count::<PowerReading>(Some(7)).unwrap(), len as u64);
    }
}
