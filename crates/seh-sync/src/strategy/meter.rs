//! Meters and their energy readings.

use tracing::warn;

use seh_core::responses::MeterSeries;
use seh_core::{SolarEdgeClient, Transport};
use seh_types::{Meter, MeterReading, SiteId, parse_timestamp};

use super::{Strategy, StrategyInput, StrategyOutput};

pub(super) async fn fetch<T: Transport>(
    client: &SolarEdgeClient<T>,
    input: &StrategyInput,
) -> seh_core::Result<Vec<MeterSeries>> {
    let mut meters = Vec::new();
    for chunk in input.chunks(Strategy::Meter) {
        meters.extend(client.get_meters(input.site_id, chunk.start, chunk.end).await?);
    }
    Ok(meters)
}

/// One meter row per distinct name, plus every dated reading.
///
/// A reading with a null value is kept; it records that the meter reported
/// nothing for that slot.
pub(super) fn map(site_id: SiteId, meters: Vec<MeterSeries>) -> StrategyOutput {
    let mut output = StrategyOutput::default();

    for series in meters {
        let Some(name) = series.display_name().map(str::to_string) else {
            warn!(site_id, "Skipping unnamed meter");
            continue;
        };

        for value in &series.values {
            let Some(date) = value.date.as_deref() else {
                warn!(site_id, meter = %name, "Skipping undated meter value");
                continue;
            };
            match parse_timestamp(date) {
                Ok(timestamp) => output.batch.meter_readings.push(MeterReading {
                    site_id,
                    meter_name: name.clone(),
                    timestamp,
                    energy_wh: value.value,
                }),
                Err(e) => warn!(site_id, meter = %name, "Skipping meter value: {}", e),
            }
        }

        output.batch.meters.push(Meter {
            site_id,
            name,
            model: series.model,
            meter_type: series.meter_type,
            serial_number: series.meter_serial_number,
            connected_to: series.connected_device_sn,
        });
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series() -> MeterSeries {
        serde_json::from_value(serde_json::json!({
            "meterSerialNumber": "M-77",
            "connectedSolaredgeDeviceSN": "7E1-A",
            "model": "WND-3Y",
            "meterType": "Production",
            "values": [
                {"date": "2024-03-01 00:00:00", "value": 10.5},
                {"date": "2024-03-01 00:15:00"},
                {"value": 3.0}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_meter_named_by_type_when_unnamed() {
        let output = map(2, vec![series()]);
        assert_eq!(output.batch.meters.len(), 1);
        let meter = &output.batch.meters[0];
        assert_eq!(meter.name, "Production");
        assert_eq!(meter.serial_number.as_deref(), Some("M-77"));
        assert_eq!(meter.connected_to.as_deref(), Some("7E1-A"));

        let readings = &output.batch.meter_readings;
        assert_eq!(readings.len(), 2);
        assert!(readings.iter().all(|r| r.meter_name == "Production"));
        assert_eq!(readings[0].energy_wh, Some(10.5));
        assert_eq!(readings[1].energy_wh, None);
    }
}
