//! Inventory by category.

use tracing::debug;

use seh_core::responses::Inventory;
use seh_types::{InventoryItem, SiteId};

use super::StrategyOutput;

pub(super) fn map(site_id: SiteId, inventory: Inventory) -> StrategyOutput {
    let mut output = StrategyOutput::default();

    for (category, entries) in inventory {
        for entry in entries {
            // Components are named by model when the vendor gives no name.
            let Some(name) = entry.name.or_else(|| entry.model.clone()) else {
                debug!(site_id, category = %category, "Skipping unnamed inventory entry");
                continue;
            };
            output.batch.inventory.push(InventoryItem {
                site_id,
                name,
                serial_number: entry.serial_number.unwrap_or_default(),
                category: category.clone(),
                manufacturer: entry.manufacturer,
                model: entry.model,
                firmware_version: entry.firmware_version,
                cpu_version: entry.cpu_version,
                connected_optimizers: entry.connected_optimizers,
            });
        }
    }

    output
}
