//! Environmental benefits totals.

use seh_core::responses::EnvBenefits;
use seh_types::{EnvironmentalBenefits, SiteId};

use super::StrategyOutput;

pub(super) fn map(site_id: SiteId, benefits: EnvBenefits) -> StrategyOutput {
    let gas = benefits.gas_emission_saved.unwrap_or_default();
    let mut output = StrategyOutput::default();
    output.batch.environmental.push(EnvironmentalBenefits {
        site_id,
        trees_planted: benefits.trees_planted,
        light_bulbs: benefits.light_bulbs,
        co2_saved: gas.co2,
        so2_saved: gas.so2,
        nox_saved: gas.nox,
        units: gas.units,
    });
    output
}
