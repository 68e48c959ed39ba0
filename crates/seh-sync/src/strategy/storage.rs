//! Batteries and their latest telemetry.
//!
//! Each battery becomes one row carrying the newest telemetry entry seen in
//! the window. Chunks are fetched oldest first, so a later chunk's snapshot
//! replaces an earlier one; a chunk without telemetry keeps the previous
//! snapshot.

use std::collections::HashMap;

use tracing::warn;

use seh_core::responses::{BatteryData, BatteryTelemetry, scalar_to_string};
use seh_core::{SolarEdgeClient, Transport};
use seh_types::{Battery, SiteId, parse_timestamp};

use super::{Strategy, StrategyInput, StrategyOutput};

pub(super) async fn fetch<T: Transport>(
    client: &SolarEdgeClient<T>,
    input: &StrategyInput,
) -> seh_core::Result<Vec<BatteryData>> {
    let mut batteries = Vec::new();
    for chunk in input.chunks(Strategy::Storage) {
        batteries.extend(
            client
                .get_storage_data(input.site_id, chunk.start, chunk.end)
                .await?,
        );
    }
    Ok(batteries)
}

pub(super) fn map(site_id: SiteId, batteries: Vec<BatteryData>) -> StrategyOutput {
    let mut output = StrategyOutput::default();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for data in batteries {
        let Some(serial_number) = data.serial_number.clone().filter(|s| !s.is_empty()) else {
            warn!(site_id, "Skipping battery without serial number");
            continue;
        };

        let mut battery = Battery {
            site_id,
            serial_number: serial_number.clone(),
            name: data.name,
            manufacturer: data.manufacturer_name,
            model: data.model_number,
            nameplate_capacity: data.nameplate,
            connected_inverter_sn: data.connected_inverter_sn,
            last_power: None,
            last_state: None,
            last_state_of_charge: None,
            lifetime_energy_charged: None,
            lifetime_energy_discharged: None,
            capacity: None,
            last_telemetry_time: None,
        };

        match positions.get(&serial_number).copied() {
            Some(index) => {
                let previous = &mut output.batch.batteries[index];
                match data.telemetries.last() {
                    Some(latest) => apply_telemetry(&mut battery, latest),
                    None => copy_telemetry(&mut battery, previous),
                }
                *previous = battery;
            }
            None => {
                if let Some(latest) = data.telemetries.last() {
                    apply_telemetry(&mut battery, latest);
                }
                positions.insert(serial_number, output.batch.batteries.len());
                output.batch.batteries.push(battery);
            }
        }
    }

    output
}

fn apply_telemetry(battery: &mut Battery, telemetry: &BatteryTelemetry) {
    battery.last_power = telemetry.power;
    battery.last_state = scalar_to_string(telemetry.battery_state.as_ref());
    battery.last_state_of_charge = telemetry.battery_percentage_state;
    battery.lifetime_energy_charged = telemetry.life_time_energy_charged;
    battery.lifetime_energy_discharged = telemetry.life_time_energy_discharged;
    battery.capacity = telemetry.full_pack_energy_available;
    battery.last_telemetry_time = telemetry
        .time_stamp
        .as_deref()
        .and_then(|value| parse_timestamp(value).ok());
}

fn copy_telemetry(battery: &mut Battery, from: &Battery) {
    battery.last_power = from.last_power;
    battery.last_state = from.last_state.clone();
    battery.last_state_of_charge = from.last_state_of_charge;
    battery.lifetime_energy_charged = from.lifetime_energy_charged;
    battery.lifetime_energy_discharged = from.lifetime_energy_discharged;
    battery.capacity = from.capacity;
    battery.last_telemetry_time = from.last_telemetry_time;
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn battery(serial: &str, telemetry: &[(&str, f64)]) -> BatteryData {
        serde_json::from_value(serde_json::json!({
            "serialNumber": serial,
            "nameplate": 9700.0,
            "modelNumber": "RESU10H",
            "telemetries": telemetry
                .iter()
                .map(|(ts, power)| serde_json::json!({
                    "timeStamp": ts,
                    "power": power,
                    "batteryState": 3,
                    "batteryPercentageState": 80.5
                }))
                .collect::<Vec<_>>()
        }))
        .unwrap()
    }

    #[test]
    fn test_latest_telemetry_wins() {
        let output = map(
            1,
            vec![battery(
                "BAT-1",
                &[("2024-03-01 10:00:00", 100.0), ("2024-03-01 10:05:00", 250.0)],
            )],
        );
        let battery = &output.batch.batteries[0];
        assert_eq!(battery.last_power, Some(250.0));
        assert_eq!(battery.last_state.as_deref(), Some("3"));
        assert_eq!(battery.last_state_of_charge, Some(80.5));
        assert_eq!(battery.last_telemetry_time, Some(datetime!(2024-03-01 10:05 UTC)));
        assert_eq!(battery.nameplate_capacity, Some(9700.0));
    }

    #[test]
    fn test_later_chunk_without_telemetry_keeps_snapshot() {
        let output = map(
            1,
            vec![
                battery("BAT-1", &[("2024-03-01 10:00:00", 100.0)]),
                battery("BAT-1", &[]),
                battery("BAT-2", &[]),
            ],
        );
        assert_eq!(output.batch.batteries.len(), 2);
        assert_eq!(output.batch.batteries[0].last_power, Some(100.0));
        assert_eq!(output.batch.batteries[1].last_telemetry_time, None);
    }

    #[test]
    fn test_battery_without_serial_is_dropped() {
        let mut data = battery("x", &[]);
        data.serial_number = None;
        assert!(map(1, vec![data]).batch.is_empty());
    }
}
