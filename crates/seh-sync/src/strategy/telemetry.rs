//! Inverter and optimizer technical data.
//!
//! Both strategies walk the serial numbers known to the store for their
//! equipment kind and fetch each one's samples chunk by chunk. A serial the
//! vendor refuses (HTTP 400/403) is skipped; any other failure fails the
//! strategy.

use tracing::{debug, info, warn};

use seh_core::responses::{TelemetrySample, scalar_to_string};
use seh_core::{SolarEdgeClient, Transport};
use seh_types::{InverterTelemetry, OptimizerTelemetry, SiteId, parse_timestamp};

use super::{Strategy, StrategyInput, StrategyOutput, not_available};

/// Samples fetched for one serial number.
#[derive(Debug, Clone, PartialEq)]
pub struct SerialSamples {
    pub serial_number: String,
    pub samples: Vec<TelemetrySample>,
}

pub(super) async fn fetch<T: Transport>(
    client: &SolarEdgeClient<T>,
    input: &StrategyInput,
) -> seh_core::Result<Vec<SerialSamples>> {
    let chunks = input.chunks(Strategy::InverterTelemetry);
    let mut result = Vec::with_capacity(input.equipment.len());

    'serials: for equipment in &input.equipment {
        let serial_number = &equipment.serial_number;
        let mut samples = Vec::new();
        for chunk in &chunks {
            match client
                .get_equipment_data(input.site_id, serial_number, chunk.start, chunk.end)
                .await
            {
                Ok(batch) => samples.extend(batch),
                Err(e) if not_available(&e, &[400, 403]) => {
                    info!(
                        site_id = input.site_id,
                        serial_number = %serial_number,
                        "Telemetry not available: {}",
                        e
                    );
                    continue 'serials;
                }
                Err(e) => return Err(e),
            }
        }
        debug!(
            site_id = input.site_id,
            serial_number = %serial_number,
            samples = samples.len(),
            "Fetched telemetry"
        );
        result.push(SerialSamples {
            serial_number: serial_number.clone(),
            samples,
        });
    }

    Ok(result)
}

/// Samples with a parseable date, paired with that timestamp.
fn dated(
    site_id: SiteId,
    serials: Vec<SerialSamples>,
) -> impl Iterator<Item = (String, time::OffsetDateTime, TelemetrySample)> {
    serials.into_iter().flat_map(move |serial| {
        let serial_number = serial.serial_number;
        serial.samples.into_iter().filter_map(move |sample| {
            let Some(date) = sample.date.as_deref() else {
                warn!(site_id, serial_number = %serial_number, "Skipping undated sample");
                return None;
            };
            match parse_timestamp(date) {
                Ok(timestamp) => Some((serial_number.clone(), timestamp, sample)),
                Err(e) => {
                    warn!(site_id, serial_number = %serial_number, "Skipping sample: {}", e);
                    None
                }
            }
        })
    })
}

pub(super) fn map_inverter(site_id: SiteId, serials: Vec<SerialSamples>) -> StrategyOutput {
    let mut output = StrategyOutput::default();
    for (serial_number, timestamp, sample) in dated(site_id, serials) {
        let phase = sample.l1_data.unwrap_or_default();
        output.batch.inverter_telemetry.push(InverterTelemetry {
            site_id,
            serial_number,
            timestamp,
            total_active_power: sample.total_active_power,
            total_energy: sample.total_energy,
            power_limit: sample.power_limit,
            temperature: sample.temperature,
            inverter_mode: sample.inverter_mode,
            operation_mode: sample.operation_mode,
            ac_current: phase.ac_current,
            ac_voltage: phase.ac_voltage,
            ac_frequency: phase.ac_frequency,
            active_power: phase.active_power,
            apparent_power: phase.apparent_power,
            reactive_power: phase.reactive_power,
            cos_phi: phase.cos_phi,
            dc_voltage: sample.dc_voltage,
        });
    }
    output
}

pub(super) fn map_optimizer(site_id: SiteId, serials: Vec<SerialSamples>) -> StrategyOutput {
    let mut output = StrategyOutput::default();
    for (serial_number, timestamp, sample) in dated(site_id, serials) {
        output.batch.optimizer_telemetry.push(OptimizerTelemetry {
            site_id,
            serial_number,
            timestamp,
            panel_id: scalar_to_string(sample.panel_id.as_ref()),
            dc_voltage: sample.dc_voltage,
            dc_current: sample.dc_current,
            dc_power: sample.dc_power,
            output_voltage: sample.output_voltage,
            output_current: sample.output_current,
            output_power: sample.output_power,
            energy: sample.energy,
            lifetime_energy: sample.lifetime_energy,
            temperature: sample.temperature,
            optimizer_mode: sample.optimizer_mode,
        });
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn samples(serial: &str, body: serde_json::Value) -> SerialSamples {
        SerialSamples {
            serial_number: serial.into(),
            samples: serde_json::from_value(body).unwrap(),
        }
    }

    #[test]
    fn test_inverter_samples_flatten_phase_data() {
        let serials = vec![samples(
            "7E1-A",
            serde_json::json!([
                {
                    "date": "2024-03-01 10:00:00",
                    "totalActivePower": 2500.0,
                    "temperature": 41.5,
                    "inverterMode": "MPPT",
                    "L1Data": {"acVoltage": 231.2, "acFrequency": 50.01, "cosPhi": 1.0}
                },
                {"totalActivePower": 1.0},
                {"date": "not a date"}
            ]),
        )];

        let rows = map_inverter(9, serials).batch.inverter_telemetry;
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.serial_number, "7E1-A");
        assert_eq!(row.timestamp, datetime!(2024-03-01 10:00 UTC));
        assert_eq!(row.ac_voltage, Some(231.2));
        assert_eq!(row.inverter_mode.as_deref(), Some("MPPT"));
        assert_eq!(row.active_power, None);
    }

    #[test]
    fn test_optimizer_panel_id_accepts_numbers() {
        let serials = vec![
            samples(
                "OPT-1",
                serde_json::json!([{"date": "2024-03-01 10:00:00", "panelId": 12, "dcVoltage": 38.2}]),
            ),
            samples(
                "OPT-2",
                serde_json::json!([{"date": "2024-03-01 10:00:00", "panelId": "1.0.12"}]),
            ),
        ];

        let rows = map_optimizer(9, serials).batch.optimizer_telemetry;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].panel_id.as_deref(), Some("12"));
        assert_eq!(rows[0].dc_voltage, Some(38.2));
        assert_eq!(rows[1].serial_number, "OPT-2");
        assert_eq!(rows[1].panel_id.as_deref(), Some("1.0.12"));
    }

    #[test]
    fn test_undated_optimizer_samples_are_dropped() {
        let serials = vec![samples(
            "OPT-1",
            serde_json::json!([
                {"panelId": 3, "dcVoltage": 37.0},
                {"date": "2024-03-01 10:15:00", "panelId": 3, "dcVoltage": 38.0}
            ]),
        )];

        let output = map_optimizer(9, serials);
        let rows = &output.batch.optimizer_telemetry;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].timestamp, datetime!(2024-03-01 10:15 UTC));
        assert_eq!(rows[0].dc_voltage, Some(38.0));
        assert!(output.warnings.is_empty());
    }
}
