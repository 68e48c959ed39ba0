//! Site power and the current power-flow snapshot.

use time::OffsetDateTime;
use tracing::{debug, warn};

use seh_core::responses::{DatedValue, FlowNode, PowerFlowSnapshot};
use seh_core::{SolarEdgeClient, Transport};
use seh_types::{PowerFlow, PowerReading, SiteId, parse_timestamp, quarter_hour_slot};

use super::{Strategy, StrategyInput, StrategyOutput};

/// Power values for the window plus the optional power-flow snapshot.
#[derive(Debug, Clone, Default)]
pub struct PowerPayload {
    pub values: Vec<DatedValue>,
    pub flow: Option<PowerFlowSnapshot>,
    /// Why the snapshot could not be fetched.
    pub flow_error: Option<String>,
    pub captured_at: Option<OffsetDateTime>,
}

pub(super) async fn fetch<T: Transport>(
    client: &SolarEdgeClient<T>,
    input: &StrategyInput,
) -> seh_core::Result<PowerPayload> {
    let mut payload = PowerPayload {
        captured_at: Some(input.captured_at),
        ..Default::default()
    };
    for chunk in input.chunks(Strategy::Power) {
        payload
            .values
            .extend(client.get_power(input.site_id, chunk.start, chunk.end).await?);
    }

    // A failed snapshot only downgrades the outcome.
    match client.get_power_flow(input.site_id).await {
        Ok(flow) => payload.flow = flow,
        Err(e) => {
            warn!(site_id = input.site_id, "Power flow unavailable: {}", e);
            payload.flow_error = Some(e.to_string());
        }
    }
    Ok(payload)
}

pub(super) fn map(site_id: SiteId, payload: PowerPayload) -> StrategyOutput {
    let mut output = StrategyOutput::default();

    for value in payload.values {
        let (Some(date), Some(power_watts)) = (value.date.as_deref(), value.value) else {
            warn!(site_id, date = ?value.date, "Skipping power value without date or value");
            continue;
        };
        match parse_timestamp(date) {
            Ok(timestamp) => output.batch.power.push(PowerReading {
                site_id,
                timestamp,
                power_watts,
            }),
            Err(e) => warn!(site_id, "Skipping power value: {}", e),
        }
    }

    if let (Some(flow), Some(captured_at)) = (payload.flow, payload.captured_at) {
        debug!(site_id, "Recording power flow snapshot");
        output.batch.power_flows.push(snapshot(site_id, flow, captured_at));
    }
    if let Some(e) = payload.flow_error {
        output.warnings.push(format!("power flow unavailable: {e}"));
    }
    output
}

fn snapshot(site_id: SiteId, flow: PowerFlowSnapshot, captured_at: OffsetDateTime) -> PowerFlow {
    let status = |node: &Option<FlowNode>| node.as_ref().and_then(|n| n.status.clone());
    let power = |node: &Option<FlowNode>| node.as_ref().and_then(|n| n.current_power);

    PowerFlow {
        site_id,
        timestamp: quarter_hour_slot(captured_at),
        grid_status: status(&flow.grid),
        grid_power: power(&flow.grid),
        pv_status: status(&flow.pv),
        pv_power: power(&flow.pv),
        load_status: status(&flow.load),
        load_power: power(&flow.load),
        storage_status: status(&flow.storage),
        storage_power: power(&flow.storage),
        storage_charge_level: flow.storage.as_ref().and_then(|n| n.charge_level),
        unit: flow.unit,
    }
}
