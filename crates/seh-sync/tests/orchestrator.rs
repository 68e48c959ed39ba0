//! End-to-end runs of the orchestrator against a scripted API and an
//! in-memory store.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::Duration as StdDuration;

use serde_json::json;
use time::OffsetDateTime;
use time::macros::datetime;

use seh_core::{MockTransport, RateLimiter, RetryConfig, SolarEdgeClient};
use seh_store::{ReadingQuery, Store, SyncCursor};
use seh_sync::{
    Config, ErrorMode, Orchestrator, PREREQUISITE_FAILED, Persistence, SiteSelection,
    StrategyStatus,
};
use seh_types::{
    DataType, EnergyReading, EquipmentKind, EquipmentRef, InverterTelemetry, PowerFlow,
    PowerReading, RecordBatch, SiteId, SyncStatus,
};

const SITE: SiteId = 42;
const NOW: OffsetDateTime = datetime!(2024-06-02 12:00 UTC);

/// Wall clock the tests can move.
#[derive(Clone)]
struct TestClock(Arc<AtomicI64>);

impl TestClock {
    fn new(at: OffsetDateTime) -> Self {
        Self(Arc::new(AtomicI64::new(at.unix_timestamp())))
    }

    fn set(&self, at: OffsetDateTime) {
        self.0.store(at.unix_timestamp(), Ordering::SeqCst);
    }

    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(self.0.load(Ordering::SeqCst)).unwrap()
    }
}

fn config(mode: ErrorMode) -> Config {
    let mut config = Config::default();
    config.api.api_key = "KEY".into();
    config.api.max_concurrent = 1;
    config.sync.error_handling = mode;
    config
}

fn client(mock: &MockTransport) -> SolarEdgeClient<MockTransport> {
    SolarEdgeClient::with_transport(mock.clone(), "http://mock", "KEY")
        .unwrap()
        .with_retry_config(RetryConfig::new(0))
}

fn orchestrator<S: Persistence>(
    client: SolarEdgeClient<MockTransport>,
    store: S,
    config: Config,
    clock: &TestClock,
) -> Orchestrator<MockTransport, S> {
    let clock = clock.clone();
    Orchestrator::new(Arc::new(client), store, Arc::new(config)).with_clock(move || clock.now())
}

/// Answer every endpoint of `site` with a small, valid body.
fn script_site(mock: &MockTransport, site: SiteId) {
    mock.respond_json(
        &format!("/site/{site}/details"),
        &json!({"details": {
            "id": site,
            "name": "Home",
            "status": "Active",
            "peakPower": 9.8,
            "lastUpdateTime": "2024-06-02 11:50:00"
        }}),
    );
    mock.respond_json(
        &format!("/equipment/{site}/list"),
        &json!({"reporters": {"count": 2, "list": [
            {"name": "Inverter 1", "serialNumber": "INV-1", "type": "Inverter"},
            {"name": "Optimizer 1", "serialNumber": "OPT-1", "type": "Optimizer"}
        ]}}),
    );
    mock.respond_json(
        &format!("/site/{site}/energy"),
        &json!({"energy": {"timeUnit": "DAY", "values": [
            {"date": "2024-06-01 00:00:00", "value": 41000.0},
            {"date": "2024-06-02 00:00:00", "value": 12000.0},
            {"date": "2024-06-03 00:00:00", "value": null}
        ]}}),
    );
    mock.respond_json(
        &format!("/site/{site}/power"),
        &json!({"power": {"values": [
            {"date": "2024-06-02 11:30:00", "value": 3100.0},
            {"date": "2024-06-02 11:45:00", "value": 3250.0}
        ]}}),
    );
    mock.respond_json(
        &format!("/site/{site}/currentPowerFlow"),
        &json!({"siteCurrentPowerFlow": {"unit": "kW", "PV": {"status": "Active", "currentPower": 3.2}}}),
    );
    mock.respond_json(
        &format!("/site/{site}/storageData"),
        &json!({"storageData": {"batteryCount": 0, "batteries": []}}),
    );
    mock.respond_json(
        &format!("/site/{site}/meters"),
        &json!({"meterEnergyDetails": {"meters": [
            {"meterType": "Production", "values": [{"date": "2024-06-02 11:00:00", "value": 800.0}]}
        ]}}),
    );
    mock.respond_json(
        &format!("/site/{site}/envBenefits"),
        &json!({"envBenefits": {"treesPlanted": 12.5, "gasEmissionSaved": {"units": "kg", "co2": 900.0}}}),
    );
    mock.respond_json(
        &format!("/site/{site}/alerts"),
        &json!({"alerts": {"alert": [
            {"alertId": 1, "severity": "LOW", "alertTimestamp": "2024-06-01T08:00:00Z"}
        ]}}),
    );
    mock.respond_json(
        &format!("/site/{site}/inventory"),
        &json!({"Inventory": {"inverters": [{"name": "Inverter 1", "SN": "INV-1"}], "meters": []}}),
    );
    mock.respond_json(
        &format!("/equipment/{site}/INV-1/data"),
        &json!({"data": {"count": 2, "telemetries": [
            {"date": "2024-06-02 11:50:00", "totalActivePower": 3200.0, "L1Data": {"acVoltage": 230.1}},
            {"date": "2024-06-02 11:55:00", "totalActivePower": 3150.0}
        ]}}),
    );
    mock.respond_json(
        &format!("/equipment/{site}/OPT-1/data"),
        &json!({"data": {"telemetries": [{"date": "2024-06-02 11:50:00", "panelId": 3, "dcVoltage": 38.0}]}}),
    );
}

fn power_query() -> ReadingQuery {
    ReadingQuery::new().site(SITE).oldest_first()
}

/// The last request to `path`.
fn last_request(mock: &MockTransport, path: &str) -> seh_core::ApiRequest {
    mock.requests()
        .into_iter()
        .rev()
        .find(|r| r.path == path)
        .unwrap()
}

#[tokio::test]
async fn test_first_run_syncs_every_data_type() {
    let mock = MockTransport::new();
    script_site(&mock, SITE);
    let clock = TestClock::new(NOW);
    let orch = orchestrator(
        client(&mock),
        Store::open_in_memory().unwrap(),
        config(ErrorMode::Lenient),
        &clock,
    );

    let summary = orch.run(SiteSelection::Ids(vec![SITE]), false).await.unwrap();

    let site = summary.site(SITE).unwrap();
    assert_eq!(site.strategies.len(), DataType::ALL.len());
    for (report, data_type) in site.strategies.iter().zip(DataType::ALL) {
        assert_eq!(report.data_type, data_type);
        assert_eq!(report.status, StrategyStatus::Success, "{data_type}");
    }
    assert_eq!(site.strategy(DataType::Energy).unwrap().records, 2);
    // Two power values plus the power-flow snapshot.
    assert_eq!(site.strategy(DataType::Power).unwrap().records, 3);
    assert_eq!(site.strategy(DataType::InverterTelemetry).unwrap().records, 2);
    assert_eq!(site.strategy(DataType::OptimizerTelemetry).unwrap().records, 1);
    assert!(!summary.failed());
    assert_eq!(summary.exit_code(), 0);

    let store = orch.store().lock().await;
    let energy = store.get_cursor(SITE, DataType::Energy).unwrap().unwrap();
    assert_eq!(energy.status, SyncStatus::Success);
    assert_eq!(energy.last_data_timestamp, Some(datetime!(2024-06-02 00:00 UTC)));
    assert_eq!(energy.last_sync_time, NOW);
    assert_eq!(energy.records_synced, 2);

    let power = store.get_cursor(SITE, DataType::Power).unwrap().unwrap();
    assert_eq!(power.last_data_timestamp, Some(datetime!(2024-06-02 11:45 UTC)));
    assert_eq!(store.count::<PowerFlow>(Some(SITE)).unwrap(), 1);
    assert_eq!(store.list_cursors(Some(SITE)).unwrap().len(), DataType::ALL.len());
}

#[tokio::test]
async fn test_first_run_uses_lookback_windows() {
    let mock = MockTransport::new();
    script_site(&mock, SITE);
    let clock = TestClock::new(NOW);
    let orch = orchestrator(
        client(&mock),
        Store::open_in_memory().unwrap(),
        config(ErrorMode::Lenient),
        &clock,
    );

    orch.run(SiteSelection::Ids(vec![SITE]), false).await.unwrap();

    let energy = last_request(&mock, "/site/42/energy");
    assert_eq!(energy.query_value("startDate"), Some("2023-06-03"));
    assert_eq!(energy.query_value("endDate"), Some("2024-06-02"));
    assert_eq!(energy.query_value("timeUnit"), Some("DAY"));
    assert_eq!(energy.query_value("api_key"), Some("KEY"));

    let power = last_request(&mock, "/site/42/power");
    assert_eq!(power.query_value("startTime"), Some("2024-05-26 12:00:00"));
    assert_eq!(power.query_value("endTime"), Some("2024-06-02 12:00:00"));

    let telemetry = last_request(&mock, "/equipment/42/INV-1/data");
    assert_eq!(telemetry.query_value("startTime"), Some("2024-06-01 12:00:00"));
}

#[tokio::test]
async fn test_incremental_run_applies_overlap() {
    let mock = MockTransport::new();
    script_site(&mock, SITE);
    let clock = TestClock::new(NOW);
    let orch = orchestrator(
        client(&mock),
        Store::open_in_memory().unwrap(),
        config(ErrorMode::Lenient),
        &clock,
    );
    orch.run(SiteSelection::Ids(vec![SITE]), false).await.unwrap();
    let before = orch.store().lock().await.query_power(&power_query()).unwrap();

    // One day later the vendor reports one new value next to the overlap one.
    clock.set(NOW + time::Duration::days(1));
    mock.respond_json(
        "/site/42/power",
        &json!({"power": {"values": [
            {"date": "2024-06-02 11:45:00", "value": 3250.0},
            {"date": "2024-06-03 09:00:00", "value": 4100.0}
        ]}}),
    );
    let summary = orch.run(SiteSelection::Ids(vec![SITE]), false).await.unwrap();
    assert_eq!(
        summary.site(SITE).unwrap().strategy(DataType::Power).unwrap().status,
        StrategyStatus::Success
    );

    let power = last_request(&mock, "/site/42/power");
    assert_eq!(power.query_value("startTime"), Some("2024-06-02 11:30:00"));
    assert_eq!(power.query_value("endTime"), Some("2024-06-03 12:00:00"));

    let energy = last_request(&mock, "/site/42/energy");
    assert_eq!(energy.query_value("startDate"), Some("2024-06-01"));

    let store = orch.store().lock().await;
    let after = store.query_power(&power_query()).unwrap();
    assert_eq!(after.len(), 3);
    // Rows inside the overlap keep their values.
    assert_eq!(&after[..2], &before[..]);

    let cursor = store.get_cursor(SITE, DataType::Power).unwrap().unwrap();
    assert_eq!(cursor.last_data_timestamp, Some(datetime!(2024-06-03 09:00 UTC)));
    assert_eq!(cursor.last_sync_time, NOW + time::Duration::days(1));
}

#[tokio::test]
async fn test_rerunning_a_window_is_idempotent() {
    let mock = MockTransport::new();
    script_site(&mock, SITE);
    let clock = TestClock::new(NOW);
    let orch = orchestrator(
        client(&mock),
        Store::open_in_memory().unwrap(),
        config(ErrorMode::Lenient),
        &clock,
    );

    orch.run(SiteSelection::Ids(vec![SITE]), true).await.unwrap();
    let (power, energy, telemetry) = {
        let store = orch.store().lock().await;
        (
            store.query_power(&power_query()).unwrap(),
            store.energy_readings(SITE).unwrap(),
            store.count::<InverterTelemetry>(Some(SITE)).unwrap(),
        )
    };

    orch.run(SiteSelection::Ids(vec![SITE]), true).await.unwrap();
    let store = orch.store().lock().await;
    assert_eq!(store.query_power(&power_query()).unwrap(), power);
    assert_eq!(store.energy_readings(SITE).unwrap(), energy);
    assert_eq!(store.count::<InverterTelemetry>(Some(SITE)).unwrap(), telemetry);
    assert_eq!(store.count::<PowerFlow>(Some(SITE)).unwrap(), 1);
}

#[tokio::test]
async fn test_high_water_never_regresses() {
    let mock = MockTransport::new();
    script_site(&mock, SITE);
    let clock = TestClock::new(NOW);
    let orch = orchestrator(
        client(&mock),
        Store::open_in_memory().unwrap(),
        config(ErrorMode::Lenient),
        &clock,
    );
    orch.run(SiteSelection::Ids(vec![SITE]), false).await.unwrap();

    // A full re-run that only sees older data keeps the newer mark.
    mock.respond_json(
        "/site/42/energy",
        &json!({"energy": {"values": [{"date": "2024-01-01 00:00:00", "value": 9000.0}]}}),
    );
    clock.set(NOW + time::Duration::hours(1));
    orch.run(SiteSelection::Ids(vec![SITE]), true).await.unwrap();

    let store = orch.store().lock().await;
    let cursor = store.get_cursor(SITE, DataType::Energy).unwrap().unwrap();
    assert_eq!(cursor.last_data_timestamp, Some(datetime!(2024-06-02 00:00 UTC)));
    assert_eq!(cursor.records_synced, 1);
    assert_eq!(store.count::<EnergyReading>(Some(SITE)).unwrap(), 3);
}

#[tokio::test]
async fn test_lenient_failure_is_isolated() {
    let mock = MockTransport::new();
    script_site(&mock, SITE);
    mock.respond("/site/42/energy", 403, "forbidden");
    let clock = TestClock::new(NOW);
    let orch = orchestrator(
        client(&mock),
        Store::open_in_memory().unwrap(),
        config(ErrorMode::Lenient),
        &clock,
    );

    let summary = orch.run(SiteSelection::Ids(vec![SITE]), false).await.unwrap();
    let site = summary.site(SITE).unwrap();
    let energy = site.strategy(DataType::Energy).unwrap();
    assert_eq!(energy.status, StrategyStatus::Error);
    assert!(energy.error.as_deref().unwrap().contains("403"));
    assert_eq!(site.strategy(DataType::Power).unwrap().status, StrategyStatus::Success);
    assert!(!summary.failed());
    assert_eq!(summary.failed_sites(), 1);

    let store = orch.store().lock().await;
    let cursor = store.get_cursor(SITE, DataType::Energy).unwrap().unwrap();
    assert_eq!(cursor.status, SyncStatus::Error);
    assert_eq!(cursor.records_synced, 0);
    assert_eq!(cursor.last_data_timestamp, None);
    assert!(cursor.error_message.unwrap().contains("forbidden"));

    let power = store.get_cursor(SITE, DataType::Power).unwrap().unwrap();
    assert_eq!(power.status, SyncStatus::Success);
    assert!(power.last_data_timestamp.is_some());
}

#[tokio::test]
async fn test_error_cursor_keeps_previous_high_water() {
    let mock = MockTransport::new();
    script_site(&mock, SITE);
    let clock = TestClock::new(NOW);
    let orch = orchestrator(
        client(&mock),
        Store::open_in_memory().unwrap(),
        config(ErrorMode::Lenient),
        &clock,
    );
    orch.run(SiteSelection::Ids(vec![SITE]), false).await.unwrap();

    mock.respond("/site/42/power", 400, "bad request");
    clock.set(NOW + time::Duration::hours(2));
    orch.run(SiteSelection::Ids(vec![SITE]), false).await.unwrap();

    let store = orch.store().lock().await;
    let cursor = store.get_cursor(SITE, DataType::Power).unwrap().unwrap();
    assert_eq!(cursor.status, SyncStatus::Error);
    assert_eq!(cursor.last_sync_time, NOW + time::Duration::hours(2));
    assert_eq!(cursor.last_data_timestamp, Some(datetime!(2024-06-02 11:45 UTC)));
}

#[tokio::test]
async fn test_strict_aborts_site_but_not_other_sites() {
    let mock = MockTransport::new();
    script_site(&mock, 1);
    script_site(&mock, 2);
    mock.respond("/site/1/energy", 403, "forbidden");
    let clock = TestClock::new(NOW);
    let orch = orchestrator(
        client(&mock),
        Store::open_in_memory().unwrap(),
        config(ErrorMode::Strict),
        &clock,
    );

    let summary = orch.run(SiteSelection::Ids(vec![1, 2]), false).await.unwrap();
    assert!(summary.failed());
    assert_eq!(summary.exit_code(), 1);

    let first = summary.site(1).unwrap();
    assert_eq!(first.strategy(DataType::Equipment).unwrap().status, StrategyStatus::Success);
    assert_eq!(first.strategy(DataType::Energy).unwrap().status, StrategyStatus::Error);
    for data_type in &DataType::ALL[3..] {
        assert_eq!(first.strategy(*data_type).unwrap().status, StrategyStatus::Aborted);
    }
    assert_eq!(mock.requests_for("/site/1/power"), 0);

    let second = summary.site(2).unwrap();
    assert!(second.succeeded());
    assert_eq!(mock.requests_for("/site/2/power"), 1);

    let store = orch.store().lock().await;
    let cursor = store.get_cursor(1, DataType::Energy).unwrap().unwrap();
    assert_eq!(cursor.status, SyncStatus::Error);
    assert!(store.get_cursor(1, DataType::Power).unwrap().is_none());
}

#[tokio::test]
async fn test_skip_mode_leaves_cursor_untouched() {
    let mock = MockTransport::new();
    script_site(&mock, SITE);
    mock.respond("/site/42/alerts", 500, "server error");
    let clock = TestClock::new(NOW);
    let orch = orchestrator(
        client(&mock),
        Store::open_in_memory().unwrap(),
        config(ErrorMode::Skip),
        &clock,
    );

    let summary = orch.run(SiteSelection::Ids(vec![SITE]), false).await.unwrap();
    let site = summary.site(SITE).unwrap();
    let alert = site.strategy(DataType::Alert).unwrap();
    assert_eq!(alert.status, StrategyStatus::Skipped);
    assert!(alert.error.is_some());
    assert!(site.succeeded());
    assert_eq!(site.strategy(DataType::Inventory).unwrap().status, StrategyStatus::Success);

    let store = orch.store().lock().await;
    assert!(store.get_cursor(SITE, DataType::Alert).unwrap().is_none());
}

#[tokio::test]
async fn test_skip_list_omits_data_types() {
    let mock = MockTransport::new();
    script_site(&mock, SITE);
    let mut config = config(ErrorMode::Lenient);
    config.sync.skip_data_types = vec![DataType::Meter, DataType::OptimizerTelemetry];
    let clock = TestClock::new(NOW);
    let orch = orchestrator(client(&mock), Store::open_in_memory().unwrap(), config, &clock);

    let summary = orch.run(SiteSelection::Ids(vec![SITE]), false).await.unwrap();
    let site = summary.site(SITE).unwrap();
    assert_eq!(site.strategy(DataType::Meter).unwrap().status, StrategyStatus::Skipped);
    assert_eq!(
        site.strategy(DataType::OptimizerTelemetry).unwrap().status,
        StrategyStatus::Skipped
    );
    assert_eq!(mock.requests_for("/site/42/meters"), 0);
    assert_eq!(mock.requests_for("/equipment/42/OPT-1/data"), 0);
    assert_eq!(mock.requests_for("/equipment/42/INV-1/data"), 1);

    let store = orch.store().lock().await;
    assert!(store.get_cursor(SITE, DataType::Meter).unwrap().is_none());
}

#[tokio::test]
async fn test_unavailable_endpoints_yield_no_records() {
    let mock = MockTransport::new();
    script_site(&mock, SITE);
    mock.respond("/site/42/meters", 400, "meters not supported");
    mock.respond("/site/42/alerts", 403, "not allowed");
    mock.respond("/equipment/42/OPT-1/data", 403, "not allowed");
    let clock = TestClock::new(NOW);
    let orch = orchestrator(
        client(&mock),
        Store::open_in_memory().unwrap(),
        config(ErrorMode::Strict),
        &clock,
    );

    let summary = orch.run(SiteSelection::Ids(vec![SITE]), false).await.unwrap();
    assert!(!summary.failed());
    let site = summary.site(SITE).unwrap();
    for data_type in [DataType::Meter, DataType::Alert, DataType::OptimizerTelemetry] {
        let report = site.strategy(data_type).unwrap();
        assert_eq!(report.status, StrategyStatus::Success, "{data_type}");
        assert_eq!(report.records, 0, "{data_type}");
    }
}

#[tokio::test]
async fn test_power_flow_failure_is_partial() {
    let mock = MockTransport::new();
    script_site(&mock, SITE);
    mock.respond("/site/42/currentPowerFlow", 403, "forbidden");
    let clock = TestClock::new(NOW);
    let orch = orchestrator(
        client(&mock),
        Store::open_in_memory().unwrap(),
        config(ErrorMode::Strict),
        &clock,
    );

    let summary = orch.run(SiteSelection::Ids(vec![SITE]), false).await.unwrap();
    assert!(!summary.failed());
    let power = summary.site(SITE).unwrap().strategy(DataType::Power).unwrap().clone();
    assert_eq!(power.status, StrategyStatus::Partial);
    assert_eq!(power.records, 2);

    let store = orch.store().lock().await;
    let cursor = store.get_cursor(SITE, DataType::Power).unwrap().unwrap();
    assert_eq!(cursor.status, SyncStatus::Partial);
    assert!(cursor.error_message.unwrap().starts_with("power flow unavailable"));
    assert_eq!(cursor.last_data_timestamp, Some(datetime!(2024-06-02 11:45 UTC)));
}

#[tokio::test]
async fn test_empty_site_details_is_an_error() {
    let mock = MockTransport::new();
    script_site(&mock, SITE);
    mock.respond_json("/site/42/details", &json!({"details": {}}));
    let clock = TestClock::new(NOW);
    let orch = orchestrator(
        client(&mock),
        Store::open_in_memory().unwrap(),
        config(ErrorMode::Lenient),
        &clock,
    );

    let summary = orch.run(SiteSelection::Ids(vec![SITE]), false).await.unwrap();
    let report = summary.site(SITE).unwrap().strategy(DataType::Site).unwrap().clone();
    assert_eq!(report.status, StrategyStatus::Error);
    assert_eq!(report.error.as_deref(), Some("Validation error: No data returned"));
}

#[tokio::test]
async fn test_telemetry_without_equipment_prerequisite() {
    // Scenario: equipment fails in lenient mode on a site with no stored
    // equipment. Telemetry runs on zero identifiers and is flagged.
    let mock = MockTransport::new();
    script_site(&mock, SITE);
    mock.respond("/equipment/42/list", 403, "forbidden");
    let clock = TestClock::new(NOW);
    let orch = orchestrator(
        client(&mock),
        Store::open_in_memory().unwrap(),
        config(ErrorMode::Lenient),
        &clock,
    );

    let summary = orch.run(SiteSelection::Ids(vec![SITE]), false).await.unwrap();
    let site = summary.site(SITE).unwrap();
    assert_eq!(site.strategy(DataType::Equipment).unwrap().status, StrategyStatus::Error);
    for data_type in [DataType::InverterTelemetry, DataType::OptimizerTelemetry] {
        let report = site.strategy(data_type).unwrap();
        assert_eq!(report.status, StrategyStatus::Partial);
        assert_eq!(report.records, 0);
        assert_eq!(report.error.as_deref(), Some(PREREQUISITE_FAILED));
    }
    assert_eq!(mock.requests_for("/equipment/42/INV-1/data"), 0);

    let store = orch.store().lock().await;
    let cursor = store.get_cursor(SITE, DataType::InverterTelemetry).unwrap().unwrap();
    assert_eq!(cursor.status, SyncStatus::Partial);
    assert_eq!(cursor.records_synced, 0);
    assert_eq!(cursor.last_data_timestamp, None);
}

#[tokio::test]
async fn test_telemetry_uses_stored_equipment_after_prerequisite_failure() {
    let mock = MockTransport::new();
    script_site(&mock, SITE);
    let clock = TestClock::new(NOW);
    let orch = orchestrator(
        client(&mock),
        Store::open_in_memory().unwrap(),
        config(ErrorMode::Lenient),
        &clock,
    );
    orch.run(SiteSelection::Ids(vec![SITE]), false).await.unwrap();

    mock.respond("/equipment/42/list", 500, "server error");
    clock.set(NOW + time::Duration::hours(1));
    let summary = orch.run(SiteSelection::Ids(vec![SITE]), false).await.unwrap();

    let report = summary
        .site(SITE)
        .unwrap()
        .strategy(DataType::InverterTelemetry)
        .unwrap()
        .clone();
    assert_eq!(report.status, StrategyStatus::Partial);
    assert_eq!(report.records, 2);
    assert_eq!(mock.requests_for("/equipment/42/INV-1/data"), 2);
}

#[tokio::test]
async fn test_telemetry_with_no_known_equipment_succeeds() {
    let mock = MockTransport::new();
    script_site(&mock, SITE);
    mock.respond_json("/equipment/42/list", &json!({"reporters": {"list": []}}));
    let clock = TestClock::new(NOW);
    let orch = orchestrator(
        client(&mock),
        Store::open_in_memory().unwrap(),
        config(ErrorMode::Strict),
        &clock,
    );

    let summary = orch.run(SiteSelection::Ids(vec![SITE]), false).await.unwrap();
    let report = summary
        .site(SITE)
        .unwrap()
        .strategy(DataType::InverterTelemetry)
        .unwrap()
        .clone();
    assert_eq!(report.status, StrategyStatus::Success);
    assert_eq!(report.records, 0);
}

#[tokio::test]
async fn test_quota_exhaustion_lenient_and_strict() {
    // One site costs ten requests when it has no equipment; a quota of
    // five runs out at the storage strategy.
    for mode in [ErrorMode::Lenient, ErrorMode::Strict] {
        let mock = MockTransport::new();
        script_site(&mock, 1);
        script_site(&mock, 2);
        mock.respond_json("/equipment/1/list", &json!({"reporters": {"list": []}}));
        let client = client(&mock).with_rate_limiter(Arc::new(RateLimiter::new(3, 5)));
        let clock = TestClock::new(NOW);
        let orch = orchestrator(client, Store::open_in_memory().unwrap(), config(mode), &clock);

        let summary = orch.run(SiteSelection::Ids(vec![1, 2]), false).await.unwrap();
        let first = summary.site(1).unwrap();
        assert_eq!(first.strategy(DataType::Power).unwrap().status, StrategyStatus::Success);
        let storage = first.strategy(DataType::Storage).unwrap();
        assert_eq!(storage.status, StrategyStatus::Error);
        assert!(storage.error.as_deref().unwrap().contains("Daily API limit"));

        // The second site is still attempted.
        let second = summary.site(2).unwrap();
        assert_eq!(second.strategy(DataType::Site).unwrap().status, StrategyStatus::Error);

        match mode {
            ErrorMode::Strict => {
                assert!(summary.failed());
                assert_eq!(
                    first.strategy(DataType::Meter).unwrap().status,
                    StrategyStatus::Aborted
                );
            }
            _ => {
                assert!(!summary.failed());
                for data_type in [
                    DataType::Meter,
                    DataType::Environmental,
                    DataType::Alert,
                    DataType::Inventory,
                ] {
                    assert_eq!(
                        first.strategy(data_type).unwrap().status,
                        StrategyStatus::Error,
                        "{data_type}"
                    );
                }
            }
        }
        assert_eq!(mock.request_count(), 5);
    }
}

#[tokio::test(start_paused = true)]
async fn test_transient_failure_is_retried_after_base_delay() {
    let mock = MockTransport::new();
    script_site(&mock, SITE);
    mock.enqueue("/site/42/energy", 500, "oops");
    mock.enqueue(
        "/site/42/energy",
        200,
        json!({"energy": {"values": [{"date": "2024-06-02 00:00:00", "value": 777.0}]}}).to_string(),
    );

    let client = SolarEdgeClient::with_transport(mock.clone(), "http://mock", "KEY")
        .unwrap()
        .with_retry_config(RetryConfig::new(3).initial_delay(StdDuration::from_secs(2)));
    let mut config = config(ErrorMode::Strict);
    config.sync.skip_data_types = DataType::ALL
        .into_iter()
        .filter(|d| *d != DataType::Energy)
        .collect();
    let clock = TestClock::new(NOW);
    let orch = orchestrator(client, Store::open_in_memory().unwrap(), config, &clock);

    let started = tokio::time::Instant::now();
    let summary = orch.run(SiteSelection::Ids(vec![SITE]), false).await.unwrap();
    let elapsed = started.elapsed();

    assert!(elapsed >= StdDuration::from_secs(2), "{elapsed:?}");
    assert!(elapsed < StdDuration::from_secs(3), "{elapsed:?}");
    assert_eq!(mock.requests_for("/site/42/energy"), 2);
    assert_eq!(
        summary.site(SITE).unwrap().strategy(DataType::Energy).unwrap().status,
        StrategyStatus::Success
    );

    let store = orch.store().lock().await;
    let energy = store.energy_readings(SITE).unwrap();
    assert_eq!(energy.len(), 1);
    assert_eq!(energy[0].energy_wh, 777.0);
}

#[tokio::test]
async fn test_all_sites_from_site_list() {
    let mock = MockTransport::new();
    mock.respond_json(
        "/sites/list",
        &json!({"sites": {"count": 3, "site": [{"id": 1}, {"id": 2}, {"name": "no id"}]}}),
    );
    script_site(&mock, 1);
    script_site(&mock, 2);
    let clock = TestClock::new(NOW);

    let orch = orchestrator(
        client(&mock),
        Store::open_in_memory().unwrap(),
        config(ErrorMode::Lenient),
        &clock,
    );
    let summary = orch.run(SiteSelection::All, false).await.unwrap();
    let ids: Vec<SiteId> = summary.sites.iter().map(|s| s.site_id).collect();
    assert_eq!(ids, [1, 2]);

    let mut narrowed = config(ErrorMode::Lenient);
    narrowed.sync.site_ids = vec![2];
    let orch = orchestrator(client(&mock), Store::open_in_memory().unwrap(), narrowed, &clock);
    let summary = orch.run(SiteSelection::All, false).await.unwrap();
    assert_eq!(summary.sites.len(), 1);
    assert_eq!(summary.sites[0].site_id, 2);
}

#[tokio::test]
async fn test_site_list_failure_fails_run() {
    let mock = MockTransport::new();
    mock.respond("/sites/list", 403, "invalid key");
    let clock = TestClock::new(NOW);
    let orch = orchestrator(
        client(&mock),
        Store::open_in_memory().unwrap(),
        config(ErrorMode::Lenient),
        &clock,
    );
    assert!(orch.run(SiteSelection::All, false).await.is_err());
}

/// Store whose upserts fail for batches carrying power readings.
struct BrokenPowerTable {
    inner: Store,
}

impl Persistence for BrokenPowerTable {
    fn upsert(&mut self, batch: &RecordBatch) -> seh_sync::persistence::Result<usize> {
        if batch.power.is_empty() {
            self.inner.upsert_batch(batch)
        } else {
            Err(seh_store::Error::UnsupportedSchema {
                found: 99,
                supported: seh_store::SCHEMA_VERSION,
            })
        }
    }

    fn get_cursor(
        &self,
        site_id: SiteId,
        data_type: DataType,
    ) -> seh_sync::persistence::Result<Option<SyncCursor>> {
        self.inner.get_cursor(site_id, data_type)
    }

    fn set_cursor(&mut self, cursor: &SyncCursor) -> seh_sync::persistence::Result<()> {
        self.inner.set_cursor(cursor)
    }

    fn known_equipment(
        &self,
        site_id: SiteId,
        kind: EquipmentKind,
    ) -> seh_sync::persistence::Result<Vec<EquipmentRef>> {
        self.inner.known_equipment(site_id, kind)
    }
}

#[tokio::test]
async fn test_persistence_failure_follows_error_mode() {
    let mock = MockTransport::new();
    script_site(&mock, SITE);
    let clock = TestClock::new(NOW);
    let store = BrokenPowerTable {
        inner: Store::open_in_memory().unwrap(),
    };
    let orch = orchestrator(client(&mock), store, config(ErrorMode::Lenient), &clock);

    let summary = orch.run(SiteSelection::Ids(vec![SITE]), false).await.unwrap();
    let site = summary.site(SITE).unwrap();
    let power = site.strategy(DataType::Power).unwrap();
    assert_eq!(power.status, StrategyStatus::Error);
    assert!(power.error.as_deref().unwrap().starts_with("Persistence error"));
    assert_eq!(site.strategy(DataType::Storage).unwrap().status, StrategyStatus::Success);

    let store = orch.store().lock().await;
    let cursor = store.inner.get_cursor(SITE, DataType::Power).unwrap().unwrap();
    assert_eq!(cursor.status, SyncStatus::Error);
    assert_eq!(store.inner.count::<PowerReading>(Some(SITE)).unwrap(), 0);
}

/// Store whose cursor reads for one data type fail while `failing` is set.
struct UnreadableCursor {
    inner: Store,
    data_type: DataType,
    failing: Arc<AtomicBool>,
}

impl Persistence for UnreadableCursor {
    fn upsert(&mut self, batch: &RecordBatch) -> seh_sync::persistence::Result<usize> {
        self.inner.upsert_batch(batch)
    }

    fn get_cursor(
        &self,
        site_id: SiteId,
        data_type: DataType,
    ) -> seh_sync::persistence::Result<Option<SyncCursor>> {
        if data_type == self.data_type && self.failing.load(Ordering::SeqCst) {
            return Err(seh_store::Error::UnsupportedSchema {
                found: 99,
                supported: seh_store::SCHEMA_VERSION,
            });
        }
        self.inner.get_cursor(site_id, data_type)
    }

    fn set_cursor(&mut self, cursor: &SyncCursor) -> seh_sync::persistence::Result<()> {
        self.inner.set_cursor(cursor)
    }

    fn known_equipment(
        &self,
        site_id: SiteId,
        kind: EquipmentKind,
    ) -> seh_sync::persistence::Result<Vec<EquipmentRef>> {
        self.inner.known_equipment(site_id, kind)
    }
}

#[tokio::test]
async fn test_unreadable_cursor_keeps_high_water() {
    let mock = MockTransport::new();
    script_site(&mock, SITE);
    let clock = TestClock::new(NOW);
    let failing = Arc::new(AtomicBool::new(false));
    let store = UnreadableCursor {
        inner: Store::open_in_memory().unwrap(),
        data_type: DataType::Power,
        failing: Arc::clone(&failing),
    };
    let orch = orchestrator(client(&mock), store, config(ErrorMode::Lenient), &clock);
    orch.run(SiteSelection::Ids(vec![SITE]), false).await.unwrap();

    failing.store(true, Ordering::SeqCst);
    clock.set(NOW + time::Duration::hours(1));
    let summary = orch.run(SiteSelection::Ids(vec![SITE]), false).await.unwrap();
    let site = summary.site(SITE).unwrap();
    assert_eq!(site.strategy(DataType::Power).unwrap().status, StrategyStatus::Error);
    assert_eq!(site.strategy(DataType::Storage).unwrap().status, StrategyStatus::Success);

    let store = orch.store().lock().await;
    let cursor = store.inner.get_cursor(SITE, DataType::Power).unwrap().unwrap();
    assert_eq!(cursor.status, SyncStatus::Success);
    assert_eq!(cursor.last_sync_time, NOW);
    assert_eq!(cursor.last_data_timestamp, Some(datetime!(2024-06-02 11:45 UTC)));
}
