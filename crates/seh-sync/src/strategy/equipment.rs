//! Equipment list: inverters, optimizers and other reporters.

use tracing::warn;

use seh_core::responses::Reporter;
use seh_types::{Equipment, EquipmentKind, SiteId, parse_timestamp};

use super::StrategyOutput;

pub(super) fn map(site_id: SiteId, reporters: Vec<Reporter>) -> StrategyOutput {
    let mut output = StrategyOutput::default();

    for reporter in reporters {
        let Some(serial_number) = reporter.serial_number.filter(|s| !s.is_empty()) else {
            warn!(site_id, name = ?reporter.name, "Skipping equipment without serial number");
            continue;
        };
        let last_report_date = reporter
            .last_report_date
            .as_deref()
            .and_then(|value| parse_timestamp(value).ok());

        output.batch.equipment.push(Equipment {
            site_id,
            serial_number,
            kind: EquipmentKind::from_vendor(reporter.kind.as_deref()),
            name: reporter.name,
            manufacturer: reporter.manufacturer,
            model: reporter.model,
            communication_method: reporter.communication_method,
            cpu_version: reporter.cpu_version,
            connected_optimizers: reporter.connected_optimizers,
            last_report_date,
        });
    }

    output
}
