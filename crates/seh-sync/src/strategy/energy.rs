//! Daily energy production.

use tracing::warn;

use seh_core::responses::DatedValue;
use seh_core::{SolarEdgeClient, Transport};
use seh_types::{EnergyReading, SiteId, parse_date};

use super::{Strategy, StrategyInput, StrategyOutput};

const TIME_UNIT: &str = "DAY";

pub(super) async fn fetch<T: Transport>(
    client: &SolarEdgeClient<T>,
    input: &StrategyInput,
) -> seh_core::Result<Vec<DatedValue>> {
    let mut values = Vec::new();
    for chunk in input.chunks(Strategy::Energy) {
        values.extend(
            client
                .get_energy(input.site_id, chunk.start_date(), chunk.end_date())
                .await?,
        );
    }
    Ok(values)
}

pub(super) fn map(site_id: SiteId, values: Vec<DatedValue>) -> StrategyOutput {
    let mut output = StrategyOutput::default();
    for value in values {
        let (Some(date), Some(energy_wh)) = (value.date.as_deref(), value.value) else {
            warn!(site_id, date = ?value.date, "Skipping energy value without date or value");
            continue;
        };
        match parse_date(date) {
            Ok(reading_date) => output.batch.energy.push(EnergyReading {
                site_id,
                reading_date,
                time_unit: TIME_UNIT.to_string(),
                energy_wh,
            }),
            Err(e) => warn!(site_id, "Skipping energy value: {}", e),
        }
    }
    output
}
