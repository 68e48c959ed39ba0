//! Site details.

use tracing::warn;

use seh_core::responses::SiteDetails;
use seh_core::{SolarEdgeClient, Transport};
use seh_types::{Site, SiteId, parse_date, parse_timestamp};

use super::StrategyOutput;
use crate::error::SyncError;

pub(super) async fn fetch<T: Transport>(
    client: &SolarEdgeClient<T>,
    site_id: SiteId,
) -> Result<SiteDetails, SyncError> {
    client
        .get_site_details(site_id)
        .await?
        .filter(|details| !details.is_empty())
        .ok_or_else(|| SyncError::Validation("No data returned".to_string()))
}

pub(super) fn map(site_id: SiteId, details: SiteDetails) -> StrategyOutput {
    let installation_date = details.installation_date.as_deref().and_then(|value| {
        parse_date(value)
            .inspect_err(|e| warn!(site_id, "Ignoring installation date: {}", e))
            .ok()
    });
    let last_update_time = details.last_update_time.as_deref().and_then(|value| {
        parse_timestamp(value)
            .inspect_err(|e| warn!(site_id, "Ignoring last update time: {}", e))
            .ok()
    });

    let site = Site {
        id: site_id,
        name: details.name,
        account_id: details.account_id,
        status: details.status,
        peak_power: details.peak_power,
        currency: details.currency,
        site_type: details.site_type,
        country: details.location.country,
        city: details.location.city,
        address: details.location.address,
        zip_code: details.location.zip,
        timezone: details.location.time_zone,
        installation_date,
        last_update_time,
        primary_module_manufacturer: details.primary_module.manufacturer_name,
        primary_module_model: details.primary_module.model_name,
        primary_module_power: details.primary_module.maximum_power,
        is_public: details.public_settings.is_public,
    };

    let mut output = StrategyOutput::default();
    output.batch.sites.push(site);
    output
}
