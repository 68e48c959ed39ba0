//! Site alerts.

use tracing::warn;

use seh_core::responses::{AlertData, scalar_to_string};
use seh_types::{Alert, SiteId, parse_timestamp};

use super::StrategyOutput;

pub(super) fn map(site_id: SiteId, alerts: Vec<AlertData>) -> StrategyOutput {
    let mut output = StrategyOutput::default();

    for alert in alerts {
        let Some(alert_id) = alert.alert_id else {
            warn!(site_id, "Skipping alert without id");
            continue;
        };
        let alert_timestamp = alert
            .alert_timestamp
            .as_deref()
            .and_then(|value| parse_timestamp(value).ok());

        output.batch.alerts.push(Alert {
            site_id,
            alert_id,
            severity: scalar_to_string(alert.severity.as_ref()),
            alert_code: alert.alert_code,
            alert_type: alert.alert_type,
            component_name: alert.component_name,
            message: alert.message,
            serial_number: alert.component_serial_number,
            alert_timestamp,
        });
    }

    output
}
